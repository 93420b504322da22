//! In-memory connector for unit tests.

use std::collections::HashMap;
use std::io::{self, Cursor, Read};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::{Error, Result};
use crate::http::{Connector, HttpRequest, HttpResponse};

/// A canned response served for one URL.
#[derive(Debug, Clone)]
pub(crate) struct Canned {
    status: u16,
    headers: Vec<(String, String)>,
    body: String,
}

impl Canned {
    pub(crate) fn ok(body: &str) -> Self {
        Self::status(200, body)
    }

    pub(crate) fn status(status: u16, body: &str) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.to_string(),
        }
    }

    pub(crate) fn with_link(mut self, link: &str) -> Self {
        self.headers.push(("Link".to_string(), link.to_string()));
        self
    }
}

/// Serves canned responses by exact URL and records every request.
///
/// Clones share state, so a test can keep one clone for assertions after
/// handing another to the client.
#[derive(Clone, Default)]
pub(crate) struct ScriptedConnector {
    routes: Arc<Mutex<HashMap<String, Canned>>>,
    requests: Arc<Mutex<Vec<HttpRequest>>>,
    released: Arc<AtomicUsize>,
}

impl ScriptedConnector {
    pub(crate) fn route(&self, url: &str, canned: Canned) {
        self.routes.lock().unwrap().insert(url.to_string(), canned);
    }

    pub(crate) fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub(crate) fn urls(&self) -> Vec<String> {
        self.requests().into_iter().map(|r| r.url).collect()
    }

    /// Number of response bodies dropped so far.
    pub(crate) fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }
}

impl Connector for ScriptedConnector {
    fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let canned = self.routes.lock().unwrap().get(&request.url).cloned();
        let url = request.url.clone();
        self.requests.lock().unwrap().push(request);
        let canned = canned.ok_or_else(|| {
            Error::Io(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                format!("no route for {url}"),
            ))
        })?;
        Ok(HttpResponse {
            status: canned.status,
            reason: reason(canned.status).map(str::to_string),
            headers: canned.headers,
            body: Box::new(TrackedBody {
                inner: Cursor::new(canned.body.into_bytes()),
                released: Arc::clone(&self.released),
            }),
        })
    }
}

fn reason(status: u16) -> Option<&'static str> {
    match status {
        200 => Some("OK"),
        201 => Some("Created"),
        204 => Some("No Content"),
        300 => Some("Multiple Choices"),
        401 => Some("Unauthorized"),
        404 => Some("Not Found"),
        500 => Some("Internal Server Error"),
        _ => None,
    }
}

struct TrackedBody {
    inner: Cursor<Vec<u8>>,
    released: Arc<AtomicUsize>,
}

impl Read for TrackedBody {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl Drop for TrackedBody {
    fn drop(&mut self) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}
