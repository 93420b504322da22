//! `Link` response header parsing.
//!
//! Entries look like `<https://host/path?page=2>; rel="next"` and are
//! separated by commas. Whitespace between tokens is insignificant.

/// Returns the URL of the first entry whose relation equals `rel`.
pub fn find<'a>(header: &'a str, rel: &str) -> Option<&'a str> {
    parse_all(header)
        .into_iter()
        .find(|(_, found)| *found == rel)
        .map(|(url, _)| url)
}

/// Returns every `(url, relation)` pair in header order.
///
/// Entries that are not of the form `<url>; rel="name"` are skipped.
pub fn parse_all(header: &str) -> Vec<(&str, &str)> {
    let mut links = Vec::new();
    let mut rest = header;
    while let Some(open) = rest.find('<') {
        let after_open = &rest[open + 1..];
        let Some(close) = after_open.find('>') else {
            break;
        };
        let url = after_open[..close].trim();
        let params_start = &after_open[close + 1..];
        // Parameters run until the next entry.
        let params_end = params_start.find('<').unwrap_or(params_start.len());
        let params = &params_start[..params_end];
        if let Some(rel) = relation(params) {
            if !url.is_empty() {
                links.push((url, rel));
            }
        }
        rest = &params_start[params_end..];
    }
    links
}

fn relation(params: &str) -> Option<&str> {
    params
        .split(|c: char| c == ';' || c == ',')
        .map(str::trim)
        .find_map(|param| {
            let (name, value) = param.split_once('=')?;
            if name.trim() != "rel" {
                return None;
            }
            let value = value.trim();
            let value = value
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .unwrap_or(value);
            (!value.is_empty()).then_some(value)
        })
}
