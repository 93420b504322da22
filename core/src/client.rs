//! Blocking JSON REST client.
//!
//! # Design
//! `RestClient` is a cheap handle over a shared `Transport`, which owns the
//! configuration, the credential and the connector. Every call builds a fresh
//! `HttpRequest` (reading the credential anew), performs one round-trip, runs
//! the status check and decodes the body straight from the response stream.
//! Nothing is cached between calls and failed calls are never retried.
//!
//! Collection endpoints go through [`RestClient::list`], which returns a lazy
//! [`Pages`] iterator instead of a decoded body.

use std::io::{BufReader, Read};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, trace, Level};
use url::Url;
use uuid::Uuid;

use crate::config::ClientConfig;
use crate::credential::Credential;
use crate::error::{Error, Result};
use crate::http::{Connector, HttpMethod, HttpRequest, HttpResponse, UreqConnector};
use crate::json::JsonReader;
use crate::mapper;
use crate::pages::Pages;
use crate::status;

/// Synchronous client for a JSON REST API.
#[derive(Clone)]
pub struct RestClient {
    transport: Arc<Transport>,
}

impl RestClient {
    /// Creates a client that talks HTTP through `ureq`.
    pub fn new(config: ClientConfig, credential: Credential) -> Self {
        let connector = UreqConnector::new(config.timeout);
        Self::with_connector(config, credential, connector)
    }

    /// Creates a client that sends its requests through `connector`.
    pub fn with_connector(
        config: ClientConfig,
        credential: Credential,
        connector: impl Connector + 'static,
    ) -> Self {
        Self {
            transport: Arc::new(Transport {
                config,
                credential,
                connector: Box::new(connector),
            }),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.transport.config
    }

    /// The credential used for every request; rotate it to refresh tokens.
    pub fn credential(&self) -> &Credential {
        &self.transport.credential
    }

    /// Fetches one object and decodes it as a `T`.
    ///
    /// Unknown and missing keys never fail the decode. A value of the wrong
    /// kind only leaves its field unset when the field is declared with
    /// `#[serde(default, deserialize_with = "restlink_core::lenient")]`;
    /// otherwise it fails the whole call with `Error::Decode`.
    pub fn get<T: DeserializeOwned>(&self, path: &str, params: &[(&str, &str)]) -> Result<T> {
        self.call::<T, ()>(HttpMethod::Get, path, params, None)
    }

    pub fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        self.call(HttpMethod::Post, path, &[], Some(body))
    }

    pub fn put<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        self.call(HttpMethod::Put, path, &[], Some(body))
    }

    /// Issues a DELETE and only checks the response status.
    pub fn delete(&self, path: &str) -> Result<()> {
        let url = self.transport.url(path, &[])?;
        self.transport.execute(HttpMethod::Delete, &url, None)?;
        Ok(())
    }

    /// Lazily iterates a collection endpoint across all of its pages.
    ///
    /// No request is sent until the first element is asked for. Item fields
    /// follow the same `lenient` rule as `get`: without it, one item with a
    /// wrongly-typed value ends the iteration with `Error::Decode`.
    pub fn list<T: DeserializeOwned>(&self, path: &str, params: &[(&str, &str)]) -> Result<Pages<T>> {
        let url = self.transport.url(path, params)?;
        Ok(Pages::new(Arc::clone(&self.transport), url))
    }

    /// Sends one request and decodes the response body as a `T`.
    pub fn call<T, B>(
        &self,
        method: HttpMethod,
        path: &str,
        params: &[(&str, &str)],
        body: Option<&B>,
    ) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize,
    {
        let url = self.transport.url(path, params)?;
        let body = body.map(mapper::encode_to_string).transpose()?;
        let (response, tracking_id) = self.transport.execute(method, &url, body)?;
        decode_body(response, &tracking_id)
    }

    /// Builds the request `call` would send, without sending it.
    pub fn build_request<B: Serialize>(
        &self,
        method: HttpMethod,
        path: &str,
        params: &[(&str, &str)],
        body: Option<&B>,
    ) -> Result<HttpRequest> {
        let url = self.transport.url(path, params)?;
        let body = body.map(mapper::encode_to_string).transpose()?;
        Ok(self.transport.request(method, &url, body, &new_tracking_id()))
    }
}

pub(crate) struct Transport {
    config: ClientConfig,
    credential: Credential,
    connector: Box<dyn Connector>,
}

impl Transport {
    fn url(&self, path: &str, params: &[(&str, &str)]) -> Result<Url> {
        let raw = format!("{}{}", self.config.base_url, path);
        let mut url = Url::parse(&raw).map_err(|source| Error::BadUrl {
            url: raw.clone(),
            source,
        })?;
        if !params.is_empty() {
            url.query_pairs_mut().extend_pairs(params);
        }
        Ok(url)
    }

    fn request(
        &self,
        method: HttpMethod,
        url: &Url,
        body: Option<String>,
        tracking_id: &str,
    ) -> HttpRequest {
        HttpRequest {
            method,
            url: url.to_string(),
            headers: vec![
                ("Content-Type".to_string(), "application/json".to_string()),
                ("Authorization".to_string(), self.credential.authorization()),
                (self.config.correlation_header.clone(), tracking_id.to_string()),
                ("User-Agent".to_string(), self.config.user_agent.clone()),
            ],
            body,
        }
    }

    /// Sends one request and checks its status.
    ///
    /// Returns the response with its body unread, plus the correlation id.
    pub(crate) fn execute(
        &self,
        method: HttpMethod,
        url: &Url,
        body: Option<String>,
    ) -> Result<(HttpResponse, String)> {
        let tracking_id = new_tracking_id();
        let request = self.request(method, url, body, &tracking_id);
        debug!(%tracking_id, %method, %url, "request");
        if let Some(body) = &request.body {
            trace!(%tracking_id, %body, "request body");
        }

        let mut response = self.connector.send(request)?;
        debug!(
            %tracking_id,
            status = response.status,
            reason = response.reason.as_deref().unwrap_or(""),
            "response"
        );
        status::check(
            response.status,
            response.reason.as_deref(),
            &mut response.body,
            &tracking_id,
        )?;
        Ok((response, tracking_id))
    }
}

fn new_tracking_id() -> String {
    Uuid::new_v4().to_string()
}

fn decode_body<T: DeserializeOwned>(mut response: HttpResponse, tracking_id: &str) -> Result<T> {
    if tracing::enabled!(Level::TRACE) {
        let mut raw = Vec::new();
        response.body.read_to_end(&mut raw)?;
        trace!(%tracking_id, body = %String::from_utf8_lossy(&raw), "response body");
        mapper::decode(&mut JsonReader::new(raw.as_slice()))
    } else {
        mapper::decode(&mut JsonReader::new(BufReader::new(response.body)))
    }
}
