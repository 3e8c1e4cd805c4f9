//! Link detection in message text.
//!
//! Splits text into plain and link segments. Two forms are recognized by a
//! single combined pattern: Markdown `[label](target)` with any target
//! (tried first) and bare `http(s)://` URLs, which get a fixed label.

use regex::Regex;
use std::sync::OnceLock;

/// Label shown for bare URLs.
pub const BARE_LINK_LABEL: &str = "Click here to view/download";

const LINK_REGEX: &str = r"\[([^\]]+)\]\(([^)\s]+)\)|(https?://\S+)";

fn link_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(LINK_REGEX).expect("link pattern is valid"))
}

/// A piece of rendered message text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Text shown verbatim.
    Text(String),
    /// A link shown as its label.
    Link { label: String, url: String },
}

impl Segment {
    /// Target URL if this is a link.
    pub fn url(&self) -> Option<&str> {
        match self {
            Self::Text(_) => None,
            Self::Link { url, .. } => Some(url),
        }
    }
}

/// Split `text` into ordered text and link segments.
///
/// Non-link text is preserved exactly. Text without links, the empty string
/// included, comes back as a single [`Segment::Text`].
pub fn segments(text: &str) -> Vec<Segment> {
    let mut out = Vec::new();
    let mut last = 0;

    for caps in link_pattern().captures_iter(text) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        if whole.start() > last {
            out.push(Segment::Text(text[last..whole.start()].to_string()));
        }

        if let (Some(label), Some(url)) = (caps.get(1), caps.get(2)) {
            out.push(Segment::Link {
                label: label.as_str().to_string(),
                url: url.as_str().to_string(),
            });
        } else if let Some(url) = caps.get(3) {
            out.push(Segment::Link {
                label: BARE_LINK_LABEL.to_string(),
                url: url.as_str().to_string(),
            });
        }
        last = whole.end();
    }

    if last < text.len() || out.is_empty() {
        out.push(Segment::Text(text[last..].to_string()));
    }
    out
}

/// URLs of all links in `text`, in order.
pub fn link_urls(text: &str) -> Vec<String> {
    segments(text)
        .iter()
        .filter_map(Segment::url)
        .map(String::from)
        .collect()
}
