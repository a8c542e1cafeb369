//! STOMP frame model: generic text frames plus the typed client and server
//! frames this client speaks.
//!
//! Text form: `VERB\nheader:value\n...\n\n[body]`.

use crate::error::{StompError, StompResult};
use crate::event::Event;

/// A generic STOMP frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub verb: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl Frame {
    pub fn new(verb: &str) -> Self {
        Self {
            verb: verb.to_string(),
            headers: Vec::new(),
            body: String::new(),
        }
    }

    pub fn header(mut self, name: &str, value: impl ToString) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn body(mut self, body: String) -> Self {
        self.body = body;
        self
    }

    /// First value of the named header.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    fn require(&self, name: &str) -> StompResult<&str> {
        self.get(name).ok_or_else(|| StompError::MissingHeader {
            verb: self.verb.clone(),
            header: name.to_string(),
        })
    }

    /// Render the frame text (without the wire terminator).
    pub fn encode(&self) -> String {
        let mut out = String::with_capacity(self.verb.len() + self.body.len() + 64);
        out.push_str(&self.verb);
        out.push('\n');
        for (k, v) in &self.headers {
            out.push_str(k);
            out.push(':');
            out.push_str(v);
            out.push('\n');
        }
        out.push('\n');
        out.push_str(&self.body);
        out
    }

    /// Parse frame text (without the wire terminator).
    pub fn parse(text: &str) -> StompResult<Self> {
        let text = text.trim_start_matches(['\r', '\n']);
        let (head, body) = split_head(text);

        let mut lines = head.lines();
        let verb = lines
            .next()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| StompError::Codec("empty frame".into()))?;

        let mut headers = Vec::new();
        for line in lines {
            let (k, v) = line
                .split_once(':')
                .ok_or_else(|| StompError::Codec(format!("malformed header line '{line}'")))?;
            headers.push((k.to_string(), v.to_string()));
        }

        Ok(Self {
            verb: verb.to_string(),
            headers,
            body: body.to_string(),
        })
    }
}

/// Split at the first blank line. Line ends may be `\n` or `\r\n`.
fn split_head(text: &str) -> (&str, &str) {
    let mut offset = 0;
    for line in text.split_inclusive('\n') {
        if line == "\n" || line == "\r\n" {
            return (&text[..offset], &text[offset + line.len()..]);
        }
        offset += line.len();
    }
    (text.trim_end_matches(['\r', '\n']), "")
}

/// Frames the client sends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientFrame {
    Connect {
        accept_version: String,
        host: String,
        login: String,
        passcode: String,
    },
    Subscribe {
        channel: String,
        id: u64,
        receipt: u64,
    },
    Unsubscribe {
        id: u64,
        receipt: u64,
    },
    Disconnect {
        receipt: u64,
    },
    Send {
        event: Event,
    },
}

impl ClientFrame {
    pub fn to_frame(&self) -> Frame {
        match self {
            Self::Connect {
                accept_version,
                host,
                login,
                passcode,
            } => Frame::new("CONNECT")
                .header("accept-version", accept_version)
                .header("host", host)
                .header("login", login)
                .header("passcode", passcode),
            Self::Subscribe {
                channel,
                id,
                receipt,
            } => Frame::new("SUBSCRIBE")
                .header("destination", format!("/{channel}"))
                .header("id", id)
                .header("receipt", receipt),
            Self::Unsubscribe { id, receipt } => Frame::new("UNSUBSCRIBE")
                .header("id", id)
                .header("receipt", receipt),
            Self::Disconnect { receipt } => Frame::new("DISCONNECT").header("receipt", receipt),
            Self::Send { event } => Frame::new("SEND")
                .header("destination", format!("/{}", event.channel))
                .body(event.to_body()),
        }
    }

    pub fn encode(&self) -> String {
        self.to_frame().encode()
    }
}

/// Frames the server sends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerFrame {
    Connected {
        version: Option<String>,
    },
    Message {
        subscription: Option<String>,
        message_id: Option<String>,
        /// Destination without the leading `/`.
        channel: String,
        body: String,
    },
    Receipt {
        receipt_id: u64,
    },
    Error {
        message: String,
        receipt_id: Option<u64>,
        body: String,
    },
}

impl ServerFrame {
    /// Decode frame text into a typed server frame.
    pub fn decode(text: &str) -> StompResult<Self> {
        Self::try_from(Frame::parse(text)?)
    }

    /// The event carried by a `MESSAGE` frame.
    pub fn event(&self) -> Option<StompResult<Event>> {
        match self {
            Self::Message { channel, body, .. } => Some(Event::from_body(channel, body)),
            _ => None,
        }
    }
}

fn parse_receipt_id(value: &str) -> StompResult<u64> {
    value
        .trim()
        .parse()
        .map_err(|_| StompError::InvalidMessage(format!("non-numeric receipt-id '{value}'")))
}

impl TryFrom<Frame> for ServerFrame {
    type Error = StompError;

    fn try_from(frame: Frame) -> StompResult<Self> {
        match frame.verb.as_str() {
            "CONNECTED" => Ok(Self::Connected {
                version: frame.get("version").map(str::to_string),
            }),
            "MESSAGE" => Ok(Self::Message {
                subscription: frame.get("subscription").map(str::to_string),
                message_id: frame.get("message-id").map(str::to_string),
                channel: frame
                    .require("destination")?
                    .trim_start_matches('/')
                    .to_string(),
                body: frame.body,
            }),
            "RECEIPT" => Ok(Self::Receipt {
                receipt_id: parse_receipt_id(frame.require("receipt-id")?)?,
            }),
            "ERROR" => Ok(Self::Error {
                message: frame.get("message").unwrap_or("").to_string(),
                receipt_id: frame.get("receipt-id").map(parse_receipt_id).transpose()?,
                body: frame.body,
            }),
            other => Err(StompError::UnknownVerb(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn connect_frame_layout() {
        let frame = ClientFrame::Connect {
            accept_version: "1.2".into(),
            host: "stomp.cs.bgu.ac.il".into(),
            login: "alice".into(),
            passcode: "pw".into(),
        };
        assert_eq!(
            frame.encode(),
            "CONNECT\naccept-version:1.2\nhost:stomp.cs.bgu.ac.il\nlogin:alice\npasscode:pw\n\n"
        );
    }

    #[test]
    fn subscribe_unsubscribe_disconnect_layout() {
        let sub = ClientFrame::Subscribe {
            channel: "police".into(),
            id: 3,
            receipt: 7,
        };
        assert_eq!(sub.encode(), "SUBSCRIBE\ndestination:/police\nid:3\nreceipt:7\n\n");
        assert_eq!(
            ClientFrame::Unsubscribe { id: 3, receipt: 8 }.encode(),
            "UNSUBSCRIBE\nid:3\nreceipt:8\n\n"
        );
        assert_eq!(
            ClientFrame::Disconnect { receipt: 9 }.encode(),
            "DISCONNECT\nreceipt:9\n\n"
        );
    }

    #[test]
    fn send_frame_layout() {
        let event = Event {
            channel: "fire".into(),
            name: "blaze".into(),
            city: "Haifa".into(),
            timestamp: 100,
            description: "big".into(),
            general_information: BTreeMap::from([
                ("active".to_string(), "true".to_string()),
                ("forces_arrival_at_scene".to_string(), "true".to_string()),
            ]),
            user: "alice".into(),
        };
        assert_eq!(
            ClientFrame::Send { event }.encode(),
            "SEND\ndestination:/fire\n\nuser:alice\ncity:Haifa\nevent name:blaze\n\
             date time:100\ngeneral information:\n\tactive:true\n\
             \tforces arrival at scene:true\ndescription:big\n"
        );
    }

    #[test]
    fn header_values_keep_colons() {
        let frame = Frame::parse("ERROR\nmessage:bad: really\n\n").unwrap();
        assert_eq!(frame.get("message"), Some("bad: really"));
    }

    #[test]
    fn decodes_receipt() {
        assert_eq!(
            ServerFrame::decode("RECEIPT\nreceipt-id:12\n\n").unwrap(),
            ServerFrame::Receipt { receipt_id: 12 }
        );
    }

    #[test]
    fn decodes_message_with_event() {
        let text = "MESSAGE\nsubscription:0\nmessage-id:5\ndestination:/police\n\n\
                    user:bob\ncity:Tel Aviv\nevent name:theft\ndate time:42\n\
                    general information:\n\tactive:false\n\tforces arrival at scene:true\n\
                    description:a bike\n";
        let frame = ServerFrame::decode(text).unwrap();
        match &frame {
            ServerFrame::Message { channel, subscription, .. } => {
                assert_eq!(channel, "police");
                assert_eq!(subscription.as_deref(), Some("0"));
            }
            other => panic!("unexpected frame {other:?}"),
        }
        let event = frame.event().unwrap().unwrap();
        assert_eq!(event.user, "bob");
        assert_eq!(event.timestamp, 42);
        assert!(event.forces_arrived());
        assert!(!event.is_active());
    }

    #[test]
    fn decodes_error_with_optional_receipt() {
        let frame = ServerFrame::decode("ERROR\nreceipt-id:4\nmessage:Wrong password\n\nbody text").unwrap();
        assert_eq!(
            frame,
            ServerFrame::Error {
                message: "Wrong password".into(),
                receipt_id: Some(4),
                body: "body text".into(),
            }
        );
    }

    #[test]
    fn unknown_verb_is_rejected() {
        assert!(matches!(
            ServerFrame::decode("HELLO\n\n"),
            Err(StompError::UnknownVerb(v)) if v == "HELLO"
        ));
    }

    #[test]
    fn receipt_without_id_is_rejected() {
        assert!(matches!(
            ServerFrame::decode("RECEIPT\n\n"),
            Err(StompError::MissingHeader { .. })
        ));
        assert!(ServerFrame::decode("RECEIPT\nreceipt-id:x\n\n").is_err());
    }

    #[test]
    fn empty_frame_is_rejected() {
        assert!(Frame::parse("\n\n").is_err());
    }

    #[test]
    fn crlf_line_ends_split_headers_from_body() {
        let frame = Frame::parse("RECEIPT\r\nreceipt-id:7\r\n\r\nnot:a header\r\n").unwrap();
        assert_eq!(frame.headers, vec![("receipt-id".to_string(), "7".to_string())]);
        assert_eq!(frame.body, "not:a header\r\n");
        assert!(matches!(
            ServerFrame::decode("RECEIPT\r\nreceipt-id:7\r\n\r\n").unwrap(),
            ServerFrame::Receipt { receipt_id: 7 }
        ));
    }

    #[test]
    fn body_lines_are_not_headers() {
        let frame = Frame::parse("ERROR\nmessage:bad\n\nline:one\n\nline:two").unwrap();
        assert_eq!(frame.headers.len(), 1);
        assert_eq!(frame.body, "line:one\n\nline:two");
    }
}
