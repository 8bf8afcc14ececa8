use std::{error, fmt, io};

#[derive(Debug)]
pub enum Error {
    PortDisconnected,
    ServiceStopped,
    MissingSession,
    ConfigError(String),
    MalformedMessage(String),
    ScrobblerError(Box<dyn error::Error + Send>),
    JsonError(Box<dyn error::Error + Send>),
    UrlError(url::ParseError),
    IoError(io::Error),
}

impl error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PortDisconnected => write!(f, "Port disconnected"),
            Self::ServiceStopped => write!(f, "Coordinator service stopped"),
            Self::MissingSession => write!(f, "No Last.fm session"),
            Self::ConfigError(msg) => write!(f, "Configuration error: {msg}"),
            Self::MalformedMessage(msg) => write!(f, "Malformed message: {msg}"),
            Self::ScrobblerError(err) | Self::JsonError(err) => err.fmt(f),
            Self::UrlError(err) => err.fmt(f),
            Self::IoError(err) => err.fmt(f),
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::IoError(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Error {
        Error::JsonError(Box::new(err))
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Error {
        Error::UrlError(err)
    }
}
