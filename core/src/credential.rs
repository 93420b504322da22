//! Bearer credential shared between the client and an external refresher.

use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwap;

const BEARER: &str = "Bearer ";

/// Swappable access token.
///
/// Clones share the same slot: a refresher holding one clone can `rotate`
/// the token and every request issued afterwards sees the new value.
#[derive(Clone)]
pub struct Credential {
    token: Arc<ArcSwap<String>>,
}

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: Arc::new(ArcSwap::from_pointee(token.into())),
        }
    }

    /// Replaces the stored token.
    pub fn rotate(&self, token: impl Into<String>) {
        self.token.store(Arc::new(token.into()));
    }

    /// `Authorization` header value for the current token.
    pub fn authorization(&self) -> String {
        let token = self.token.load();
        if token.starts_with(BEARER) {
            token.as_str().to_string()
        } else {
            format!("{BEARER}{}", token.as_str())
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential").field("token", &"<redacted>").finish()
    }
}
