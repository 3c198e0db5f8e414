//! Accept-header negotiation between the two rejection body formats.

use axum::http::{header, HeaderMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Json,
    Html,
}

impl Format {
    pub fn as_str(&self) -> &'static str {
        match self {
            Format::Json => "json",
            Format::Html => "html",
        }
    }

    fn media_type(&self) -> (&'static str, &'static str) {
        match self {
            Format::Json => ("application", "json"),
            Format::Html => ("text", "html"),
        }
    }
}

/// One entry of an Accept header.
#[derive(Debug)]
struct MediaRange<'a> {
    kind: &'a str,
    subtype: &'a str,
    q: f32,
    index: usize,
}

impl MediaRange<'_> {
    /// 2 = exact, 1 = `type/*`, 0 = `*/*`; `None` if it doesn't match.
    fn specificity(&self, kind: &str, subtype: &str) -> Option<u8> {
        if self.kind == "*" && self.subtype == "*" {
            Some(0)
        } else if self.kind.eq_ignore_ascii_case(kind) && self.subtype == "*" {
            Some(1)
        } else if self.kind.eq_ignore_ascii_case(kind) && self.subtype.eq_ignore_ascii_case(subtype) {
            Some(2)
        } else {
            None
        }
    }
}

fn parse_accept(value: &str, offset: usize) -> impl Iterator<Item = MediaRange<'_>> {
    value
        .split(',')
        .enumerate()
        .filter_map(move |(i, entry)| {
            let mut parts = entry.split(';');
            let (kind, subtype) = parts.next()?.trim().split_once('/')?;
            let q = parts
                .filter_map(|param| param.trim().strip_prefix("q="))
                .find_map(|q| q.trim().parse::<f32>().ok())
                .unwrap_or(1.0);
            Some(MediaRange {
                kind: kind.trim(),
                subtype: subtype.trim(),
                q,
                index: offset + i,
            })
        })
}

/// Pick the format the client prefers.
///
/// Highest q wins, then the more specific match, then the earlier entry.
/// No Accept header, or nothing acceptable, yields JSON.
pub fn preferred_format(headers: &HeaderMap) -> Format {
    let ranges: Vec<MediaRange<'_>> = headers
        .get_all(header::ACCEPT)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .enumerate()
        .flat_map(|(n, value)| parse_accept(value, n * 1000))
        .collect();

    if ranges.is_empty() {
        return Format::Json;
    }

    let score = |format: Format| {
        let (kind, subtype) = format.media_type();
        ranges
            .iter()
            .filter_map(|range| range.specificity(kind, subtype).map(|s| (s, range)))
            .max_by_key(|(s, range)| (*s, std::cmp::Reverse(range.index)))
            .map(|(s, range)| (range.q, s, range.index))
    };

    match (score(Format::Json), score(Format::Html)) {
        (Some(json), Some(html)) if html.0 > 0.0 => {
            let html_wins = html.0 > json.0
                || (html.0 == json.0 && (html.1 > json.1 || (html.1 == json.1 && html.2 < json.2)));
            if html_wins {
                Format::Html
            } else {
                Format::Json
            }
        }
        (None, Some(html)) if html.0 > 0.0 => Format::Html,
        _ => Format::Json,
    }
}
