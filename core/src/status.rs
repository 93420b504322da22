//! Response status classification.
//!
//! # Design
//! Success is the half-open range `[200, 300)`; 300 itself is a failure.
//! A failure message is `bad response code <code>[ <reason>][: <message>]`
//! where `<message>` comes from a best-effort decode of the error body as an
//! [`ErrorBody`]. Failing to read or decode that body never changes the
//! failure being raised, it only drops the suffix.

use std::io::Read;

use tracing::trace;

use crate::error::{Error, Result};
use crate::json::JsonReader;
use crate::mapper;
use crate::types::ErrorBody;

pub fn is_success(status: u16) -> bool {
    (200..300).contains(&status)
}

/// Returns `Ok(())` for success codes, otherwise a composed `Error::Response`.
pub fn check<R: Read>(status: u16, reason: Option<&str>, body: R, tracking_id: &str) -> Result<()> {
    if is_success(status) {
        return Ok(());
    }
    let mut message = format!("bad response code {status}");
    if let Some(reason) = reason.filter(|r| !r.is_empty()) {
        message.push(' ');
        message.push_str(reason);
    }
    if let Some(server_message) = server_message(body, tracking_id) {
        message.push_str(": ");
        message.push_str(&server_message);
    }
    Err(Error::Response { status, message })
}

fn server_message<R: Read>(mut body: R, tracking_id: &str) -> Option<String> {
    let mut raw = Vec::new();
    body.read_to_end(&mut raw).ok()?;
    trace!(%tracking_id, body = %String::from_utf8_lossy(&raw), "error response body");
    let parsed: ErrorBody = mapper::decode(&mut JsonReader::new(raw.as_slice())).ok()?;
    parsed.message
}
