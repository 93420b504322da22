//! Blocking client core for JSON REST APIs.
//!
//! # Overview
//! Sends authenticated JSON requests, maps bodies to and from plain data
//! structs, and walks `Link`-paginated collections as one lazy iterator.
//!
//! # Design
//! - `RestClient` performs one blocking round-trip per call through a
//!   `Connector` (`ureq` by default) and never retries.
//! - Data objects are serde structs with `Option` fields. Field names are
//!   JSON keys; unknown keys, missing keys and (with [`lenient`]) mistyped
//!   values never fail a decode.
//! - `Pages` streams each page's `items` array with a pull JSON reader and
//!   fetches the next page only when the current one is exhausted.
//! - The bearer token lives in a swappable `Credential` and is read on every
//!   request.

pub mod client;
pub mod config;
pub mod credential;
pub mod error;
pub mod http;
pub mod json;
pub mod link;
pub mod mapper;
pub mod pages;
pub mod status;
pub mod types;

#[cfg(test)]
mod test_support;

pub use client::RestClient;
pub use config::ClientConfig;
pub use credential::Credential;
pub use error::{Error, Result};
pub use http::{Connector, HttpMethod, HttpRequest, HttpResponse, UreqConnector};
pub use mapper::lenient;
pub use pages::Pages;
pub use types::ErrorBody;
