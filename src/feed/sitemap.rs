//! News sitemap parser.
//!
//! Reads a `urlset` document of `url` elements. Each `url` carries a `loc`
//! and optionally a `news:news` block with `title`, `publication_date` and
//! comma-separated `keywords`. Elements are matched by local name so any
//! namespace prefix is accepted.

use chrono::{DateTime, NaiveDate, Utc};
use quick_xml::events::Event;
use quick_xml::Reader;
use tracing::{debug, warn};

use super::types::Entry;
use crate::{Result, TrackerError};

/// Fields collected for one `url` element.
#[derive(Debug, Default)]
struct RawEntry {
    loc: String,
    title: String,
    publication_date: String,
    keywords: String,
    malformed: bool,
}

impl RawEntry {
    fn push_text(&mut self, parent: &str, element: &str, text: &str) {
        let field = match (parent, element) {
            ("url", "loc") => &mut self.loc,
            ("news", "title") => &mut self.title,
            ("news", "publication_date") => &mut self.publication_date,
            ("news", "keywords") => &mut self.keywords,
            _ => return,
        };
        field.push_str(text);
    }

    /// Convert to an entry, or `None` if the element must be skipped.
    fn into_entry(self) -> Option<Entry> {
        if self.malformed {
            warn!("Skipping sitemap entry with malformed text: {}", self.loc.trim());
            return None;
        }

        let loc = self.loc.trim();
        if loc.is_empty() {
            warn!("Skipping sitemap entry without <loc>");
            return None;
        }
        if let Err(e) = url::Url::parse(loc) {
            warn!("Skipping sitemap entry with invalid <loc> {}: {}", loc, e);
            return None;
        }

        let title = match self.title.trim() {
            "" => title_from_url(loc),
            t => t.to_string(),
        };

        let published_at = match self.publication_date.trim() {
            "" => None,
            raw => {
                let parsed = parse_publication_date(raw);
                if parsed.is_none() {
                    debug!("Unparseable publication date for {}: {}", loc, raw);
                }
                parsed
            }
        };

        let keywords = self
            .keywords
            .split(',')
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(String::from)
            .collect();

        Some(Entry {
            url: loc.to_string(),
            title,
            published_at,
            keywords,
        })
    }
}

/// Parse a sitemap document into entries, in document order.
///
/// Malformed XML or a root other than `urlset` is an error. An individual
/// `url` element without a usable `loc` is skipped with a warning.
pub fn parse_sitemap(xml: &str) -> Result<Vec<Entry>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut path: Vec<String> = Vec::new();
    let mut seen_root = false;
    let mut current: Option<RawEntry> = None;
    let mut entries = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = local_name(e.local_name().as_ref());
                if path.is_empty() {
                    check_root(&name, &mut seen_root)?;
                } else if path.len() == 1 && name == "url" {
                    current = Some(RawEntry::default());
                }
                path.push(name);
            }
            Ok(Event::Empty(e)) => {
                if path.is_empty() {
                    let name = local_name(e.local_name().as_ref());
                    check_root(&name, &mut seen_root)?;
                }
            }
            Ok(Event::Text(t)) => {
                if let Some(raw) = current.as_mut() {
                    match t.unescape() {
                        Ok(text) => push_at(raw, &path, &text),
                        Err(e) => {
                            debug!("Unescape error in sitemap entry: {}", e);
                            raw.malformed = true;
                        }
                    }
                }
            }
            Ok(Event::CData(c)) => {
                if let Some(raw) = current.as_mut() {
                    let bytes = c.into_inner();
                    push_at(raw, &path, &String::from_utf8_lossy(&bytes));
                }
            }
            Ok(Event::End(_)) => {
                let closed = path.pop();
                if path.len() == 1 && closed.as_deref() == Some("url") {
                    if let Some(entry) = current.take().and_then(RawEntry::into_entry) {
                        entries.push(entry);
                    }
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(TrackerError::Fetch(format!(
                    "malformed sitemap at byte {}: {}",
                    reader.error_position(),
                    e
                )));
            }
        }
    }

    if !seen_root {
        return Err(TrackerError::Fetch("sitemap has no urlset element".to_string()));
    }
    if !path.is_empty() {
        return Err(TrackerError::Fetch(format!(
            "sitemap truncated inside <{}>",
            path.join("/")
        )));
    }

    Ok(entries)
}

fn check_root(name: &str, seen_root: &mut bool) -> Result<()> {
    if name != "urlset" {
        return Err(TrackerError::Fetch(format!(
            "unexpected sitemap root element <{}>",
            name
        )));
    }
    *seen_root = true;
    Ok(())
}

fn push_at(raw: &mut RawEntry, path: &[String], text: &str) {
    if let [.., parent, element] = path {
        raw.push_text(parent, element, text);
    }
}

fn local_name(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

/// Parse a W3C datetime as used by news sitemaps.
///
/// Accepts full RFC 3339, minute precision with offset, and bare dates
/// (taken as midnight UTC).
pub fn parse_publication_date(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%dT%H:%M%:z") {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

/// Derive a display title from the last path segment of a URL.
///
/// `https://site/news/big-win-for-locals/` becomes `Big Win For Locals`.
pub fn title_from_url(url: &str) -> String {
    let without_query = url.split(['?', '#']).next().unwrap_or(url);
    let slug = without_query
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default();

    slug.replace(['-', '_'], " ")
        .split_whitespace()
        .map(capitalize)
        .collect::<Vec<_>>()
        .join(" ")
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}
