//! Error type for the REST client.
//!
//! # Design
//! Every fatal condition surfaces as a single `Error` value: transport
//! failures (`Transport`, `Io`), protocol failures (`BadUrl`, `Protocol`),
//! server-reported failures (`Response`) and conversion failures (`Decode`,
//! `Encode`). Per-field decode anomalies never reach this type; they are
//! absorbed by `mapper::lenient`.

use thiserror::Error;

/// A specialized `Result` for client operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Connecting, sending or receiving failed inside the HTTP agent.
    #[error("io error: {0}")]
    Transport(#[from] ureq::Error),

    /// Reading a response body stream failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The request URL or a `Link` target could not be parsed.
    #[error("bad url: {url}")]
    BadUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    /// The response JSON did not have the expected shape.
    #[error("bad json: {0}")]
    Protocol(String),

    /// The server answered with a status outside `[200, 300)`.
    ///
    /// `message` is the composed `bad response code ...` text.
    #[error("{message}")]
    Response { status: u16, message: String },

    /// A decoded JSON value could not be converted into the target type.
    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// A request body did not encode to a JSON object.
    #[error("encode error: {0}")]
    Encode(String),

    /// `Pages::take_item` was called with no buffered element.
    #[error("no such element")]
    NoSuchElement,

    /// Configuration could not be loaded.
    #[error("config error: {0}")]
    Config(String),
}

impl Error {
    /// HTTP status of a server-reported failure.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Response { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub(crate) fn protocol(message: impl Into<String>) -> Self {
        Error::Protocol(message.into())
    }
}
