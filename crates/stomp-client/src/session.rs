//! Client session state machine.
//!
//! A `Session` validates user commands against the login state and the
//! subscription table, builds outgoing frames, correlates receipts, and owns
//! the background frame reader. All session state is mutated from the
//! foreground only: the reader hands decoded frames over a channel and the
//! caller feeds them back through [`Session::handle_inbound`].

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{self, Instant};
use tracing::{debug, error, info, warn};

use stomp_core::error::{StompError, StompResult};
use stomp_core::event::{parse_events_file, sort_events, Event};
use stomp_core::frame::{ClientFrame, ServerFrame};
use stomp_core::transport::{Connector, FrameSink};

use crate::command::{self, Command, CommandError, Keyword};
use crate::reader::{FrameReader, Inbound};
use crate::receipts::{ReceiptKind, ReceiptTracker};
use crate::store::EventStore;
use crate::subscriptions::SubscriptionTable;
use crate::summary::write_summary;

/// Session settings.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Value of the CONNECT `accept-version` header.
    pub accept_version: String,
    /// Value of the CONNECT `host` header.
    pub virtual_host: String,
    /// Upper bound on a connection attempt.
    pub connect_timeout: Duration,
    /// How long logout waits for the DISCONNECT receipt.
    pub disconnect_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            accept_version: "1.2".to_string(),
            virtual_host: "stomp.cs.bgu.ac.il".to_string(),
            connect_timeout: Duration::from_secs(10),
            disconnect_timeout: Duration::from_secs(5),
        }
    }
}

/// Login status of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LoginState {
    LoggedOut = 0,
    Connecting = 1,
    LoggedIn = 2,
}

/// Lock-free login state shared with the frame reader.
#[derive(Debug, Default)]
pub struct LoginFlag(AtomicU8);

impl LoginFlag {
    pub fn get(&self) -> LoginState {
        match self.0.load(Ordering::Acquire) {
            1 => LoginState::Connecting,
            2 => LoginState::LoggedIn,
            _ => LoginState::LoggedOut,
        }
    }

    pub fn set(&self, state: LoginState) {
        self.0.store(state as u8, Ordering::Release);
    }
}

/// Source of events for the `report` command.
pub trait EventParser: Send + Sync {
    /// Parse the events in `path`, attributing them to `user`.
    fn parse(&self, path: &Path, user: &str) -> StompResult<Vec<Event>>;
}

/// Reads the JSON event-file format.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonEventParser;

impl EventParser for JsonEventParser {
    fn parse(&self, path: &Path, user: &str) -> StompResult<Vec<Event>> {
        parse_events_file(path, user).map(|file| file.events)
    }
}

/// A user-visible line produced by the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Connected { host: String, port: u16 },
    LoginSuccessful,
    AlreadyLoggedIn,
    WrongPassword,
    CouldNotConnect { host: String, port: u16, reason: String },
    PleaseLoginFirst,
    Command(CommandError),
    AlreadySubscribed(String),
    NotSubscribed(String),
    /// Reporting to a channel without an active subscription. The event is
    /// sent anyway.
    ReportingUnsubscribed(String),
    Joined(String),
    Exited(String),
    LoggedOut,
    Reported { count: usize },
    ReportFailed { path: PathBuf, reason: String },
    NoReports { channel: String, user: String },
    SummaryWritten { path: PathBuf },
    SummaryFailed { path: PathBuf, reason: String },
    ServerError { message: String, body: String },
    ProtocolViolation(String),
    ConnectionLost(String),
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connected { host, port } => write!(f, "Connected to {host}:{port}"),
            Self::LoginSuccessful => f.write_str("Login successful"),
            Self::AlreadyLoggedIn => {
                f.write_str("The client is already logged in, log out before trying again")
            }
            Self::WrongPassword => f.write_str("Wrong password"),
            Self::CouldNotConnect { host, port, reason } => {
                write!(f, "Could not connect to server {host}:{port}: {reason}")
            }
            Self::PleaseLoginFirst => f.write_str("please login first"),
            Self::Command(e) => write!(f, "{e}"),
            Self::AlreadySubscribed(ch) => write!(f, "you are already subscribed to channel {ch}"),
            Self::NotSubscribed(ch) => write!(f, "you are not subscribed to channel {ch}"),
            Self::ReportingUnsubscribed(ch) => write!(f, "you are not registered to channel {ch}"),
            Self::Joined(ch) => write!(f, "Joined channel {ch}"),
            Self::Exited(ch) => write!(f, "Exited channel {ch}"),
            Self::LoggedOut => f.write_str("Logged out"),
            Self::Reported { count } => write!(f, "reported {count} events"),
            Self::ReportFailed { path, reason } => {
                write!(f, "could not report {}: {reason}", path.display())
            }
            Self::NoReports { .. } => f.write_str("no reports to summarize"),
            Self::SummaryWritten { path } => {
                write!(f, "Summary generated in file: {}", path.display())
            }
            Self::SummaryFailed { path, reason } => {
                write!(f, "could not write summary to {}: {reason}", path.display())
            }
            Self::ServerError { message, body } => {
                write!(f, "server error: {message}")?;
                if !body.trim().is_empty() {
                    write!(f, "\n{}", body.trim_end())?;
                }
                Ok(())
            }
            Self::ProtocolViolation(reason) => {
                write!(f, "protocol error: {reason}, disconnecting")
            }
            Self::ConnectionLost(reason) => write!(f, "connection lost: {reason}"),
        }
    }
}

/// What a command or inbound frame produced: frames sent and notices raised.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub frames: Vec<String>,
    pub notices: Vec<Notice>,
}

impl Outcome {
    fn notice(&mut self, notice: Notice) {
        self.notices.push(notice);
    }
}

/// The live connection.
struct Link {
    sink: Box<dyn FrameSink>,
    reader: FrameReader,
    inbound: mpsc::UnboundedReceiver<Inbound>,
}

/// The client session.
pub struct Session {
    config: SessionConfig,
    connector: Arc<dyn Connector>,
    parser: Box<dyn EventParser>,
    login: Arc<LoginFlag>,
    user: String,
    /// First password seen per username, for the process lifetime.
    credentials: HashMap<String, String>,
    subscriptions: SubscriptionTable,
    receipts: ReceiptTracker,
    store: EventStore,
    link: Option<Link>,
    /// Receipt id of an in-flight DISCONNECT.
    disconnecting: Option<u64>,
}

impl Session {
    pub fn new(connector: Arc<dyn Connector>, config: SessionConfig) -> Self {
        Self {
            config,
            connector,
            parser: Box::new(JsonEventParser),
            login: Arc::new(LoginFlag::default()),
            user: String::new(),
            credentials: HashMap::new(),
            subscriptions: SubscriptionTable::new(),
            receipts: ReceiptTracker::new(),
            store: EventStore::new(),
            link: None,
            disconnecting: None,
        }
    }

    /// Replace the event-file parser used by `report`.
    pub fn with_event_parser(mut self, parser: impl EventParser + 'static) -> Self {
        self.parser = Box::new(parser);
        self
    }

    pub fn login_state(&self) -> LoginState {
        self.login.get()
    }

    pub fn is_logged_in(&self) -> bool {
        self.login.get() == LoginState::LoggedIn
    }

    /// Shared handle to the login flag.
    pub fn login_flag(&self) -> Arc<LoginFlag> {
        self.login.clone()
    }

    /// Logged-in user name, empty when logged out.
    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn subscriptions(&self) -> &SubscriptionTable {
        &self.subscriptions
    }

    pub fn receipts(&self) -> &ReceiptTracker {
        &self.receipts
    }

    pub fn store(&self) -> &EventStore {
        &self.store
    }

    /// Parse and run one command line.
    pub async fn execute(&mut self, line: &str) -> Outcome {
        let mut out = Outcome::default();
        match command::parse(line) {
            Ok(cmd) => {
                if cmd.keyword() != Keyword::Login && !self.is_logged_in() {
                    out.notice(Notice::PleaseLoginFirst);
                } else {
                    self.dispatch(cmd, &mut out).await;
                }
            }
            Err(e) => match e.keyword() {
                Some(k) if k != Keyword::Login && !self.is_logged_in() => {
                    out.notice(Notice::PleaseLoginFirst);
                }
                _ => out.notice(Notice::Command(e)),
            },
        }
        out
    }

    async fn dispatch(&mut self, cmd: Command, out: &mut Outcome) {
        debug!(keyword = %cmd.keyword(), "dispatching command");
        match cmd {
            Command::Login {
                host,
                port,
                username,
                password,
            } => self.login(host, port, username, password, out).await,
            Command::Join { channel } => self.join(channel, out).await,
            Command::Exit { channel } => self.exit(channel, out).await,
            Command::Logout => self.logout(out).await,
            Command::Report { path } => self.report(path, out).await,
            Command::Summary {
                channel,
                user,
                path,
            } => self.summary(channel, user, path, out),
        }
    }

    async fn login(
        &mut self,
        host: String,
        port: u16,
        username: String,
        password: String,
        out: &mut Outcome,
    ) {
        if self.login.get() != LoginState::LoggedOut {
            out.notice(Notice::AlreadyLoggedIn);
            return;
        }
        if self.link.is_some() {
            // The reader saw the connection drop but its notice was never
            // handled.
            self.teardown(out, Some(Notice::ConnectionLost("connection closed".into())))
                .await;
        }

        match self.credentials.get(&username) {
            Some(known) if *known != password => {
                out.notice(Notice::WrongPassword);
                return;
            }
            Some(_) => {}
            None => {
                self.credentials.insert(username.clone(), password.clone());
            }
        }

        self.login.set(LoginState::Connecting);
        let connector = self.connector.clone();
        let attempt = time::timeout(self.config.connect_timeout, connector.connect(&host, port))
            .await
            .unwrap_or(Err(StompError::Timeout));
        let connection = match attempt {
            Ok(connection) => connection,
            Err(e) => {
                self.login.set(LoginState::LoggedOut);
                warn!("cannot connect to {}:{}: {}", host, port, e);
                out.notice(Notice::CouldNotConnect {
                    host,
                    port,
                    reason: e.to_string(),
                });
                return;
            }
        };

        self.login.set(LoginState::LoggedIn);
        let (reader, inbound) = FrameReader::spawn(connection.source, self.login.clone());
        self.link = Some(Link {
            sink: connection.sink,
            reader,
            inbound,
        });
        self.user = username.clone();

        let frame = ClientFrame::Connect {
            accept_version: self.config.accept_version.clone(),
            host: self.config.virtual_host.clone(),
            login: username,
            passcode: password,
        };
        if self.transmit(frame, out).await {
            info!("logged in as '{}' at {}:{}", self.user, host, port);
            out.notice(Notice::Connected { host, port });
        }
    }

    async fn join(&mut self, channel: String, out: &mut Outcome) {
        if self.subscriptions.contains(&channel) {
            out.notice(Notice::AlreadySubscribed(channel));
            return;
        }

        let id = self.subscriptions.subscribe(&channel);
        let receipt = self.receipts.issue(ReceiptKind::Subscribe {
            channel: channel.clone(),
            id,
        });
        self.transmit(
            ClientFrame::Subscribe {
                channel,
                id,
                receipt,
            },
            out,
        )
        .await;
    }

    async fn exit(&mut self, channel: String, out: &mut Outcome) {
        let Some(sub) = self.subscriptions.unsubscribe(&channel) else {
            out.notice(Notice::NotSubscribed(channel));
            return;
        };

        let receipt = self.receipts.issue(ReceiptKind::Unsubscribe {
            channel,
            id: sub.id,
        });
        self.transmit(ClientFrame::Unsubscribe { id: sub.id, receipt }, out)
            .await;
    }

    async fn logout(&mut self, out: &mut Outcome) {
        let receipt = self.receipts.issue(ReceiptKind::Disconnect);
        self.disconnecting = Some(receipt);
        if !self.transmit(ClientFrame::Disconnect { receipt }, out).await {
            return;
        }

        let deadline = Instant::now() + self.config.disconnect_timeout;
        while let Some(link) = self.link.as_mut() {
            let next = time::timeout_at(deadline, link.inbound.recv()).await;
            match next {
                Ok(Some(inbound)) => self.apply_inbound(inbound, out).await,
                Ok(None) => self.teardown(out, Some(Notice::LoggedOut)).await,
                Err(_) => {
                    warn!(
                        "no receipt for DISCONNECT within {:?}, closing anyway",
                        self.config.disconnect_timeout
                    );
                    self.teardown(out, Some(Notice::LoggedOut)).await;
                }
            }
        }
    }

    async fn report(&mut self, path: PathBuf, out: &mut Outcome) {
        let mut events = match self.parser.parse(&path, &self.user) {
            Ok(events) => events,
            Err(e) => {
                warn!("cannot report {}: {}", path.display(), e);
                out.notice(Notice::ReportFailed {
                    path,
                    reason: e.to_string(),
                });
                return;
            }
        };
        sort_events(&mut events);

        let user = self.user.clone();
        let mut count = 0;
        for event in events {
            if !self.subscriptions.contains(&event.channel) {
                out.notice(Notice::ReportingUnsubscribed(event.channel.clone()));
            }
            let channel = event.channel.clone();
            if !self.transmit(ClientFrame::Send { event: event.clone() }, out).await {
                return;
            }
            self.store.append(&user, &channel, event);
            count += 1;
        }
        out.notice(Notice::Reported { count });
    }

    fn summary(&mut self, channel: String, user: Option<String>, path: PathBuf, out: &mut Outcome) {
        let user = user.unwrap_or_else(|| self.user.clone());
        let mut events = self.store.snapshot(&user, &channel);
        if events.is_empty() {
            out.notice(Notice::NoReports { channel, user });
            return;
        }
        sort_events(&mut events);

        match write_summary(&path, &channel, &user, &events) {
            Ok(_) => out.notice(Notice::SummaryWritten { path }),
            Err(e) => {
                error!("cannot write summary {}: {}", path.display(), e);
                out.notice(Notice::SummaryFailed {
                    path,
                    reason: e.to_string(),
                });
            }
        }
    }

    /// Send one frame. A send failure tears the session down.
    async fn transmit(&mut self, frame: ClientFrame, out: &mut Outcome) -> bool {
        let Some(link) = self.link.as_mut() else {
            debug!("no connection, dropping frame");
            return false;
        };

        let text = frame.encode();
        let sent = link.sink.send(&text).await;
        match sent {
            Ok(()) => {
                debug!(frame = %text, "frame sent");
                out.frames.push(text);
                true
            }
            Err(e) => {
                error!("failed to send frame: {}", e);
                self.teardown(out, Some(Notice::ConnectionLost(e.to_string())))
                    .await;
                false
            }
        }
    }

    // ── Inbound ──────────────────────────────────────────────────────

    /// Wait for the next item from the frame reader. Never resolves while
    /// there is no connection.
    pub async fn next_inbound(&mut self) -> Inbound {
        match self.link.as_mut() {
            Some(link) => link.inbound.recv().await.unwrap_or(Inbound::Closed),
            None => std::future::pending().await,
        }
    }

    /// Apply one item from the frame reader to the session.
    pub async fn handle_inbound(&mut self, inbound: Inbound) -> Outcome {
        let mut out = Outcome::default();
        self.apply_inbound(inbound, &mut out).await;
        out
    }

    /// Wait for and apply the next inbound item.
    pub async fn process_next(&mut self) -> Outcome {
        let inbound = self.next_inbound().await;
        self.handle_inbound(inbound).await
    }

    async fn apply_inbound(&mut self, inbound: Inbound, out: &mut Outcome) {
        if self.link.is_none() {
            debug!(?inbound, "dropping inbound item after teardown");
            return;
        }

        match inbound {
            Inbound::Frame(frame) => self.apply_frame(frame, out).await,
            Inbound::Malformed(e) => {
                self.teardown(out, Some(Notice::ProtocolViolation(e.to_string())))
                    .await
            }
            Inbound::Closed => {
                let notice = if self.disconnecting.is_some() {
                    Notice::LoggedOut
                } else {
                    Notice::ConnectionLost("connection closed by server".into())
                };
                self.teardown(out, Some(notice)).await;
            }
            Inbound::Failed(e) => {
                self.teardown(out, Some(Notice::ConnectionLost(e.to_string())))
                    .await
            }
        }
    }

    async fn apply_frame(&mut self, frame: ServerFrame, out: &mut Outcome) {
        match frame {
            ServerFrame::Connected { version } => {
                info!(?version, "broker accepted login");
                out.notice(Notice::LoginSuccessful);
            }
            message @ ServerFrame::Message { .. } => {
                if let Some(parsed) = message.event() {
                    self.apply_message(parsed);
                }
            }
            ServerFrame::Receipt { receipt_id } => match self.receipts.resolve(receipt_id) {
                Ok(ReceiptKind::Subscribe { channel, id }) => {
                    if self.subscriptions.confirm(&channel, id) {
                        out.notice(Notice::Joined(channel));
                    } else {
                        debug!(%channel, id, "ignoring receipt for a subscription already exited");
                    }
                }
                Ok(ReceiptKind::Unsubscribe { channel, .. }) => {
                    out.notice(Notice::Exited(channel));
                }
                Ok(ReceiptKind::Disconnect) => {
                    self.teardown(out, Some(Notice::LoggedOut)).await;
                }
                Err(e) => {
                    error!("receipt {} rejected: {}", receipt_id, e);
                    self.teardown(out, Some(Notice::ProtocolViolation(e.to_string())))
                        .await;
                }
            },
            ServerFrame::Error { message, body, .. } => {
                error!("server error: {}", message);
                self.teardown(out, Some(Notice::ServerError { message, body }))
                    .await;
            }
        }
    }

    fn apply_message(&mut self, parsed: StompResult<Event>) {
        let event = match parsed {
            Ok(event) => event,
            Err(e) => {
                warn!("dropping unreadable event: {}", e);
                return;
            }
        };
        let channel = event.channel.clone();

        // Our own reports were recorded when they were sent.
        if event.user == self.user {
            debug!(%channel, "skipping echo of own report");
            return;
        }
        if !self.subscriptions.contains(&channel) {
            warn!(%channel, "message for a channel without subscription");
        }

        debug!(%channel, user = %event.user, name = %event.name, "event received");
        let user = event.user.clone();
        self.store.append(&user, &channel, event);
    }

    // ── Teardown ─────────────────────────────────────────────────────

    /// Stop the reader, close the transport and reset per-login state.
    async fn teardown(&mut self, out: &mut Outcome, notice: Option<Notice>) {
        self.login.set(LoginState::LoggedOut);

        if let Some(mut link) = self.link.take() {
            link.reader.signal_stop();
            if let Err(e) = link.sink.close().await {
                debug!("closing transport: {}", e);
            }
            link.reader.join().await;
        }

        self.subscriptions.clear();
        self.receipts.clear();
        self.disconnecting = None;
        if !self.user.is_empty() {
            let dropped = self.store.evict(&self.user);
            info!("session for '{}' closed, {} stored events dropped", self.user, dropped);
        }
        self.user.clear();

        if let Some(notice) = notice {
            out.notice(notice);
        }
    }

    /// Log out if logged in and release the connection.
    pub async fn close(&mut self) -> Outcome {
        if self.is_logged_in() {
            return self.execute("logout").await;
        }
        let mut out = Outcome::default();
        if self.link.is_some() {
            self.teardown(&mut out, None).await;
        }
        out
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Some(link) = self.link.as_mut() {
            link.reader.signal_stop();
        }
    }
}
