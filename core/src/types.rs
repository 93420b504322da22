//! Wire shapes shared by every endpoint.

use serde::{Deserialize, Serialize};

use crate::mapper::lenient;

/// Structured error body some servers attach to non-2xx responses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    #[serde(default, deserialize_with = "lenient")]
    pub message: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub errors: Option<Vec<String>>,
    #[serde(default, rename = "trackingId", deserialize_with = "lenient")]
    pub tracking_id: Option<String>,
}
