//! User command grammar.
//!
//! Turns a text line from the outer loop into a [`Command`]. Grammar errors
//! carry the command keyword so the session can check the login precondition
//! before reporting usage.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// The six command keywords.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    Login,
    Join,
    Exit,
    Logout,
    Report,
    Summary,
}

impl Keyword {
    fn from_token(token: &str) -> Option<Self> {
        match token {
            "login" => Some(Self::Login),
            "join" => Some(Self::Join),
            "exit" => Some(Self::Exit),
            "logout" => Some(Self::Logout),
            "report" => Some(Self::Report),
            "summary" => Some(Self::Summary),
            _ => None,
        }
    }

    /// Usage line shown for a malformed command.
    pub fn usage(self) -> &'static str {
        match self {
            Self::Login => "login command needs 3 args: {host:port} {username} {password}",
            Self::Join => "join command needs 1 args: {channel_name}",
            Self::Exit => "exit command needs 1 args: {channel_name}",
            Self::Logout => "logout command needs 0 args",
            Self::Report => "report command needs 1 args: {file}",
            Self::Summary => "summary command needs args: {channel_name} [{user}] {file}",
        }
    }
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let word = match self {
            Self::Login => "login",
            Self::Join => "join",
            Self::Exit => "exit",
            Self::Logout => "logout",
            Self::Report => "report",
            Self::Summary => "summary",
        };
        f.write_str(word)
    }
}

/// A validated user command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Login {
        host: String,
        port: u16,
        username: String,
        password: String,
    },
    Join {
        channel: String,
    },
    Exit {
        channel: String,
    },
    Logout,
    Report {
        path: PathBuf,
    },
    /// `user` is `None` in the two-argument form: summarize the logged-in user.
    Summary {
        channel: String,
        user: Option<String>,
        path: PathBuf,
    },
}

impl Command {
    pub fn keyword(&self) -> Keyword {
        match self {
            Self::Login { .. } => Keyword::Login,
            Self::Join { .. } => Keyword::Join,
            Self::Exit { .. } => Keyword::Exit,
            Self::Logout => Keyword::Logout,
            Self::Report { .. } => Keyword::Report,
            Self::Summary { .. } => Keyword::Summary,
        }
    }
}

/// Grammar errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("Invalid command")]
    Unknown(String),

    #[error("{}", .0.usage())]
    Usage(Keyword),

    #[error("illegal port '{0}'")]
    BadPort(String),
}

impl CommandError {
    /// The keyword the error belongs to, if the line named one.
    pub fn keyword(&self) -> Option<Keyword> {
        match self {
            Self::Unknown(_) => None,
            Self::Usage(k) => Some(*k),
            Self::BadPort(_) => Some(Keyword::Login),
        }
    }
}

/// Parse one command line.
pub fn parse(line: &str) -> Result<Command, CommandError> {
    let mut tokens = line.split_whitespace();
    let first = tokens.next().unwrap_or("");
    let keyword =
        Keyword::from_token(first).ok_or_else(|| CommandError::Unknown(first.to_string()))?;
    let args: Vec<&str> = tokens.collect();

    match (keyword, args.as_slice()) {
        (Keyword::Login, [addr, username, password]) => {
            let (host, port) = split_host_port(addr)?;
            Ok(Command::Login {
                host,
                port,
                username: username.to_string(),
                password: password.to_string(),
            })
        }
        (Keyword::Join, [channel]) => Ok(Command::Join {
            channel: normalize_channel(channel, keyword)?,
        }),
        (Keyword::Exit, [channel]) => Ok(Command::Exit {
            channel: normalize_channel(channel, keyword)?,
        }),
        (Keyword::Logout, []) => Ok(Command::Logout),
        (Keyword::Report, [path]) => Ok(Command::Report {
            path: PathBuf::from(path),
        }),
        (Keyword::Summary, [channel, path]) => Ok(Command::Summary {
            channel: normalize_channel(channel, keyword)?,
            user: None,
            path: PathBuf::from(path),
        }),
        (Keyword::Summary, [channel, user, path]) => Ok(Command::Summary {
            channel: normalize_channel(channel, keyword)?,
            user: Some(user.to_string()),
            path: PathBuf::from(path),
        }),
        (keyword, _) => Err(CommandError::Usage(keyword)),
    }
}

/// Split `host:port` at the last colon.
fn split_host_port(addr: &str) -> Result<(String, u16), CommandError> {
    let (host, port) = addr
        .rsplit_once(':')
        .ok_or(CommandError::Usage(Keyword::Login))?;
    if host.is_empty() {
        return Err(CommandError::Usage(Keyword::Login));
    }
    let port = port
        .parse::<u16>()
        .map_err(|_| CommandError::BadPort(port.to_string()))?;
    Ok((host.to_string(), port))
}

/// Channel names are stored without a leading `/`.
fn normalize_channel(raw: &str, keyword: Keyword) -> Result<String, CommandError> {
    let channel = raw.trim_start_matches('/');
    if channel.is_empty() {
        return Err(CommandError::Usage(keyword));
    }
    Ok(channel.to_string())
}
