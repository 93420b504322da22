//! Lazy iteration over `Link`-paginated collections.
//!
//! # Design
//! A collection page is a JSON object with an `items` array; the next page is
//! announced by a `rel="next"` entry in the `Link` response header. `Pages`
//! is a pull-based state machine:
//!
//! ```text
//! Start(url) --GET, seek `items`--> InPage --`]`--> AtBoundary
//!     ^                                                  |
//!     +------------- next link, different URL -----------+
//!                      no next link or same URL --> Done
//! ```
//!
//! Only one page (one open response body) is held at a time. It is dropped
//! as soon as the iterator moves past it, and any failure moves the iterator
//! to `Done`.

use std::io::{BufRead, BufReader, Read};
use std::iter::FusedIterator;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::client::Transport;
use crate::error::{Error, Result};
use crate::http::HttpMethod;
use crate::json::{Event, JsonReader};
use crate::link;
use crate::mapper;

const ITEMS_KEY: &str = "items";
const NEXT_REL: &str = "next";

/// Forward-only sequence of every item of a paginated collection.
///
/// Use `advance`/`take_item` directly, or the `Iterator` impl which yields
/// `Result<T>` and stops after the first error.
pub struct Pages<T> {
    transport: Arc<Transport>,
    state: State,
    buffered: Option<T>,
}

enum State {
    Start(Url),
    InPage(Page),
    AtBoundary(Page),
    Done,
}

struct Page {
    url: Url,
    link: Option<String>,
    reader: JsonReader<BufReader<Box<dyn Read>>>,
}

impl<T: DeserializeOwned> Pages<T> {
    pub(crate) fn new(transport: Arc<Transport>, url: Url) -> Self {
        Self {
            transport,
            state: State::Start(url),
            buffered: None,
        }
    }

    /// Makes the next item available to `take_item`.
    ///
    /// Returns `false` once the collection is exhausted. Calling it again
    /// before `take_item` does not skip an item.
    pub fn advance(&mut self) -> Result<bool> {
        loop {
            if self.buffered.is_some() {
                return Ok(true);
            }
            match std::mem::replace(&mut self.state, State::Done) {
                State::Done => return Ok(false),
                State::Start(url) => {
                    let page = self.open(url)?;
                    self.state = State::InPage(page);
                }
                State::InPage(mut page) => match page.reader.expect_event()? {
                    Event::StartObject => {
                        self.buffered = Some(mapper::decode_object(&mut page.reader)?);
                        self.state = State::InPage(page);
                    }
                    Event::EndArray => self.state = State::AtBoundary(page),
                    other => {
                        return Err(Error::protocol(format!(
                            "expected object in {ITEMS_KEY}, found {other}"
                        )))
                    }
                },
                State::AtBoundary(page) => {
                    if let Some(next) = next_url(&page)? {
                        debug!(from = %page.url, to = %next, "following next link");
                        self.state = State::Start(next);
                    } else {
                        debug!(url = %page.url, "last page reached");
                    }
                }
            }
        }
    }

    /// Returns the item made available by the last successful `advance`.
    pub fn take_item(&mut self) -> Result<T> {
        self.buffered.take().ok_or(Error::NoSuchElement)
    }

    fn open(&self, url: Url) -> Result<Page> {
        let (response, tracking_id) = self.transport.execute(HttpMethod::Get, &url, None)?;
        let link = response.joined_header("Link");
        let mut reader = JsonReader::new(BufReader::new(response.body));
        seek_items(&mut reader)?;
        debug!(%tracking_id, %url, has_link = link.is_some(), "page opened");
        Ok(Page { url, link, reader })
    }
}

impl<T: DeserializeOwned> Iterator for Pages<T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.advance() {
            Ok(true) => Some(self.take_item()),
            Ok(false) => None,
            Err(e) => Some(Err(e)),
        }
    }
}

impl<T: DeserializeOwned> FusedIterator for Pages<T> {}

/// Resolves the page's `next` link, or `None` when iteration should stop.
fn next_url(page: &Page) -> Result<Option<Url>> {
    let Some(raw) = page.link.as_deref().and_then(|h| link::find(h, NEXT_REL)) else {
        return Ok(None);
    };
    let next = page.url.join(raw).map_err(|source| Error::BadUrl {
        url: raw.to_string(),
        source,
    })?;
    // A page pointing at itself would loop forever.
    Ok((next != page.url).then_some(next))
}

/// Positions `reader` just inside the top-level `items` array.
fn seek_items<R: BufRead>(reader: &mut JsonReader<R>) -> Result<()> {
    match reader.expect_event()? {
        Event::StartObject => {}
        other => return Err(Error::protocol(format!("expected page object, found {other}"))),
    }
    loop {
        match reader.expect_event()? {
            Event::Key(key) if key == ITEMS_KEY => break,
            Event::Key(_) => {
                let first = reader.expect_event()?;
                reader.skip_value(first)?;
            }
            _ => return Err(Error::protocol(format!("no {ITEMS_KEY} in page"))),
        }
    }
    match reader.expect_event()? {
        Event::StartArray => Ok(()),
        other => Err(Error::protocol(format!(
            "expected {ITEMS_KEY} array, found {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    use super::*;
    use crate::mapper::lenient;
    use crate::test_support::{Canned, ScriptedConnector};
    use crate::{ClientConfig, Credential, RestClient};

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    struct Widget {
        #[serde(default, deserialize_with = "lenient")]
        id: Option<String>,
    }

    fn client(connector: &ScriptedConnector) -> RestClient {
        RestClient::with_connector(
            ClientConfig::new("https://api.example.com"),
            Credential::new("t"),
            connector.clone(),
        )
    }

    fn ids(pages: Pages<Widget>) -> Vec<String> {
        pages
            .map(|w| w.unwrap().id.unwrap_or_default())
            .collect()
    }

    #[test]
    fn follows_next_link_across_pages() {
        let connector = ScriptedConnector::default();
        connector.route(
            "https://api.example.com/widgets",
            Canned::ok(r#"{"items":[{"id":"1"},{"id":"2"}]}"#)
                .with_link(r#"<https://api.example.com/widgets?page=2>; rel="next""#),
        );
        connector.route(
            "https://api.example.com/widgets?page=2",
            Canned::ok(r#"{"items":[{"id":"3"}]}"#),
        );
        let pages = client(&connector).list::<Widget>("/widgets", &[]).unwrap();
        assert_eq!(ids(pages), ["1", "2", "3"]);
        assert_eq!(
            connector.urls(),
            [
                "https://api.example.com/widgets",
                "https://api.example.com/widgets?page=2"
            ]
        );
        assert_eq!(connector.released(), 2);
    }

    #[test]
    fn next_link_in_separate_header_line_is_followed() {
        let connector = ScriptedConnector::default();
        connector.route(
            "https://api.example.com/widgets",
            Canned::ok(r#"{"items":[{"id":"1"}]}"#)
                .with_link(r#"<https://api.example.com/widgets>; rel="first""#)
                .with_link(r#"<https://api.example.com/widgets?page=2>; rel="next""#),
        );
        connector.route(
            "https://api.example.com/widgets?page=2",
            Canned::ok(r#"{"items":[{"id":"2"}]}"#),
        );
        let pages = client(&connector).list::<Widget>("/widgets", &[]).unwrap();
        assert_eq!(ids(pages), ["1", "2"]);
    }

    #[test]
    fn list_is_lazy() {
        let connector = ScriptedConnector::default();
        let _pages = client(&connector).list::<Widget>("/widgets", &[("max", "2")]).unwrap();
        assert!(connector.requests().is_empty());
    }

    #[test]
    fn self_link_terminates() {
        let connector = ScriptedConnector::default();
        connector.route(
            "https://api.example.com/loop",
            Canned::ok(r#"{"items":[{"id":"a"}]}"#)
                .with_link(r#"<https://api.example.com/loop>; rel="next""#),
        );
        let pages = client(&connector).list::<Widget>("/loop", &[]).unwrap();
        assert_eq!(ids(pages), ["a"]);
        assert_eq!(connector.requests().len(), 1);
    }

    #[test]
    fn last_page_without_next_relation_terminates() {
        let connector = ScriptedConnector::default();
        connector.route(
            "https://api.example.com/widgets",
            Canned::ok(r#"{"items":[{"id":"1"}]}"#).with_link(
                r#"<https://api.example.com/widgets>; rel="first", <https://api.example.com/widgets>; rel="last""#,
            ),
        );
        let pages = client(&connector).list::<Widget>("/widgets", &[]).unwrap();
        assert_eq!(ids(pages), ["1"]);
    }

    #[test]
    fn empty_page_in_the_middle_is_skipped() {
        let connector = ScriptedConnector::default();
        connector.route(
            "https://api.example.com/w",
            Canned::ok(r#"{"items":[]}"#).with_link(r#"<https://api.example.com/w?p=2>; rel="next""#),
        );
        connector.route(
            "https://api.example.com/w?p=2",
            Canned::ok(r#"{"items":[{"id":"x"}]}"#).with_link(r#"<https://api.example.com/w?p=3>; rel="next""#),
        );
        connector.route("https://api.example.com/w?p=3", Canned::ok(r#"{"items":[]}"#));
        let pages = client(&connector).list::<Widget>("/w", &[]).unwrap();
        assert_eq!(ids(pages), ["x"]);
        assert_eq!(connector.released(), 3);
    }

    #[test]
    fn relative_next_link_resolves_against_page() {
        let connector = ScriptedConnector::default();
        connector.route(
            "https://api.example.com/v1/widgets",
            Canned::ok(r#"{"items":[{"id":"1"}]}"#).with_link(r#"</v1/widgets?cursor=abc>; rel="next""#),
        );
        connector.route(
            "https://api.example.com/v1/widgets?cursor=abc",
            Canned::ok(r#"{"items":[{"id":"2"}]}"#),
        );
        let pages = client(&connector).list::<Widget>("/v1/widgets", &[]).unwrap();
        assert_eq!(ids(pages), ["1", "2"]);
    }

    #[test]
    fn items_after_other_members() {
        let connector = ScriptedConnector::default();
        connector.route(
            "https://api.example.com/w",
            Canned::ok(r#"{"meta":{"items":"decoy","n":[1,{"x":2}]},"count":2,"items":[{"id":"1","extra":{"a":[]}},{"id":"2"}],"tail":true}"#),
        );
        let pages = client(&connector).list::<Widget>("/w", &[]).unwrap();
        assert_eq!(ids(pages), ["1", "2"]);
    }

    #[test]
    fn advance_is_idempotent_and_take_item_requires_advance() {
        let connector = ScriptedConnector::default();
        connector.route("https://api.example.com/w", Canned::ok(r#"{"items":[{"id":"1"},{"id":"2"}]}"#));
        let mut pages = client(&connector).list::<Widget>("/w", &[]).unwrap();

        assert!(matches!(pages.take_item(), Err(Error::NoSuchElement)));
        assert!(pages.advance().unwrap());
        assert!(pages.advance().unwrap());
        assert_eq!(pages.take_item().unwrap().id.as_deref(), Some("1"));
        assert!(matches!(pages.take_item(), Err(Error::NoSuchElement)));
        assert!(pages.advance().unwrap());
        assert_eq!(pages.take_item().unwrap().id.as_deref(), Some("2"));
        assert!(!pages.advance().unwrap());
        assert!(!pages.advance().unwrap());
        assert!(matches!(pages.take_item(), Err(Error::NoSuchElement)));
        assert_eq!(connector.requests().len(), 1);
    }

    #[test]
    fn error_status_on_first_page() {
        let connector = ScriptedConnector::default();
        connector.route(
            "https://api.example.com/w",
            Canned::status(401, r#"{"message":"token expired"}"#),
        );
        let mut pages = client(&connector).list::<Widget>("/w", &[]).unwrap();
        let err = pages.advance().unwrap_err();
        assert_eq!(err.to_string(), "bad response code 401 Unauthorized: token expired");
        assert!(!pages.advance().unwrap());
    }

    #[test]
    fn error_status_on_later_page_after_earlier_items() {
        let connector = ScriptedConnector::default();
        connector.route(
            "https://api.example.com/w",
            Canned::ok(r#"{"items":[{"id":"1"}]}"#).with_link(r#"<https://api.example.com/w?p=2>; rel="next""#),
        );
        connector.route("https://api.example.com/w?p=2", Canned::status(500, ""));
        let mut pages = client(&connector).list::<Widget>("/w", &[]).unwrap();
        assert_eq!(pages.next().unwrap().unwrap().id.as_deref(), Some("1"));
        let err = pages.next().unwrap().unwrap_err();
        assert_eq!(err.status(), Some(500));
        assert!(pages.next().is_none());
        assert_eq!(connector.released(), 2);
    }

    #[test]
    fn missing_items_is_a_protocol_failure() {
        let connector = ScriptedConnector::default();
        connector.route("https://api.example.com/w", Canned::ok(r#"{"data":[]}"#));
        let mut pages = client(&connector).list::<Widget>("/w", &[]).unwrap();
        assert!(matches!(pages.advance(), Err(Error::Protocol(_))));
    }

    #[test]
    fn items_must_be_an_array() {
        let connector = ScriptedConnector::default();
        connector.route("https://api.example.com/w", Canned::ok(r#"{"items":{"id":"1"}}"#));
        let mut pages = client(&connector).list::<Widget>("/w", &[]).unwrap();
        let err = pages.advance().unwrap_err();
        assert!(err.to_string().contains("expected items array"), "{err}");
    }

    #[test]
    fn page_must_be_an_object() {
        let connector = ScriptedConnector::default();
        connector.route("https://api.example.com/w", Canned::ok(r#"[{"id":"1"}]"#));
        let mut pages = client(&connector).list::<Widget>("/w", &[]).unwrap();
        assert!(matches!(pages.advance(), Err(Error::Protocol(_))));
    }

    #[test]
    fn non_object_item_is_a_protocol_failure() {
        let connector = ScriptedConnector::default();
        connector.route("https://api.example.com/w", Canned::ok(r#"{"items":[{"id":"1"},"two"]}"#));
        let mut pages = client(&connector).list::<Widget>("/w", &[]).unwrap();
        assert!(pages.advance().unwrap());
        pages.take_item().unwrap();
        assert!(matches!(pages.advance(), Err(Error::Protocol(_))));
    }

    #[test]
    fn truncated_page_fails() {
        let connector = ScriptedConnector::default();
        connector.route("https://api.example.com/w", Canned::ok(r#"{"items":[{"id":"1"},{"id":"#));
        let results: Vec<_> = client(&connector).list::<Widget>("/w", &[]).unwrap().collect();
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert!(results[1].is_err());
    }

    #[test]
    fn broken_next_link_fails() {
        let connector = ScriptedConnector::default();
        connector.route(
            "https://api.example.com/w",
            Canned::ok(r#"{"items":[]}"#).with_link(r#"<http://[::1>; rel="next""#),
        );
        let mut pages = client(&connector).list::<Widget>("/w", &[]).unwrap();
        assert!(matches!(pages.advance(), Err(Error::BadUrl { .. })));
        assert_eq!(connector.released(), 1);
    }

    #[test]
    fn next_link_to_unreachable_host_fails() {
        let connector = ScriptedConnector::default();
        connector.route(
            "https://api.example.com/w",
            Canned::ok(r#"{"items":[]}"#).with_link(r#"<https://elsewhere.example.com/w>; rel="next""#),
        );
        let mut pages = client(&connector).list::<Widget>("/w", &[]).unwrap();
        assert!(matches!(pages.advance(), Err(Error::Io(_))));
    }

    #[test]
    fn query_parameters_are_sent_on_first_page() {
        let connector = ScriptedConnector::default();
        connector.route("https://api.example.com/w?max=2", Canned::ok(r#"{"items":[{"id":"1"}]}"#));
        let pages = client(&connector).list::<Widget>("/w", &[("max", "2")]).unwrap();
        assert_eq!(ids(pages), ["1"]);
    }
}
