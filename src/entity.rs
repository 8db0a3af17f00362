use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use url::Url;

use crate::window::Window;

/// A candidate item as surfaced by a source adapter, before normalization.
///
/// Adapters are free to fill whichever date-like fields their origin exposes;
/// [`normalize`] re-validates everything against the window.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawItem {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    /// Best date-like string the adapter saw (`post_date`, `published_at`, ...).
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub doc_type: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub summary_url: String,
    /// Free-text audit line preserved from discovery.
    #[serde(default)]
    pub raw_line: String,
}

/// The canonical entity shape shared by every source.
///
/// `canonical_url` is the stable identity key for the whole run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub source: String,
    pub doc_type: String,
    pub title: String,
    pub url: String,
    pub canonical_url: String,
    #[serde(default)]
    pub summary_url: String,
    #[serde(default)]
    pub summary: String,
    pub post_date: Option<NaiveDate>,
    #[serde(default)]
    pub raw_line: String,
}

/// Per-source filter accounting, persisted as `window_stats` in the filtered
/// artifact. Operational debugging of an adapter starts here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowStats {
    pub total: usize,
    pub inside: usize,
    pub outside: usize,
    pub no_date: usize,
    pub no_title: usize,
    pub no_url: usize,
    pub dupes: usize,
    pub kept: usize,
}

static ISO_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{4})-(\d{2})-(\d{2})\b").expect("valid regex"));
static SLASH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{4})/(\d{1,2})/(\d{1,2})\b").expect("valid regex"));
static LONG_MONTH_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(January|February|March|April|May|June|July|August|September|October|November|December)[\s\u{00A0}]+(\d{1,2}),?\s*(20\d{2})\b",
    )
    .expect("valid regex")
});

fn month_number(name: &str) -> Option<u32> {
    const MONTHS: [&str; 12] = [
        "january",
        "february",
        "march",
        "april",
        "may",
        "june",
        "july",
        "august",
        "september",
        "october",
        "november",
        "december",
    ];
    let lower = name.to_ascii_lowercase();
    MONTHS.iter().position(|m| *m == lower).map(|i| i as u32 + 1)
}

/// Coerce a heterogeneous date-like string to a date.
///
/// Accepts `YYYY-MM-DD` (possibly embedded in a longer string, e.g. a full
/// timestamp), `YYYY/M/D`, and long month names such as `(January 20, 2025)`
/// with NBSPs or unicode brackets around them.
pub fn coerce_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Some(c) = ISO_RE.captures(s) {
        return NaiveDate::from_ymd_opt(c[1].parse().ok()?, c[2].parse().ok()?, c[3].parse().ok()?);
    }
    if let Some(c) = SLASH_RE.captures(s) {
        return NaiveDate::from_ymd_opt(c[1].parse().ok()?, c[2].parse().ok()?, c[3].parse().ok()?);
    }
    if let Some(c) = LONG_MONTH_RE.captures(s) {
        let month = month_number(&c[1])?;
        return NaiveDate::from_ymd_opt(c[3].parse().ok()?, month, c[2].parse().ok()?);
    }
    None
}

/// Join `href` against `base` (when given), lowercase scheme/host, and strip
/// the fragment. The query string is kept; it is often load-bearing for
/// docket and registry links.
pub fn canonicalize_url(href: &str, base: Option<&str>) -> String {
    let href = href.trim();
    if href.is_empty() {
        return String::new();
    }
    let parsed = match base.and_then(|b| Url::parse(b).ok()) {
        Some(b) => b.join(href),
        None => Url::parse(href),
    };
    match parsed {
        Ok(mut u) => {
            u.set_fragment(None);
            u.to_string()
        }
        Err(_) => href.to_string(),
    }
}

/// Normalize raw adapter output into canonical entities for one window.
///
/// One order-preserving pass: field mapping, date coercion, window gating,
/// then dedupe on `canonical_url` (falling back to a `date|title` composite
/// when an item has no URL at all is unnecessary here because url-less items
/// are already dropped and counted). Pure; callers persist the results.
pub fn normalize(raw_items: &[RawItem], window: Window, source: &str) -> (Vec<Entity>, WindowStats) {
    let mut stats = WindowStats {
        total: raw_items.len(),
        ..WindowStats::default()
    };
    let mut seen: HashSet<String> = HashSet::new();
    let mut kept: Vec<Entity> = Vec::new();

    for item in raw_items {
        let title = item.title.trim();
        let url = item.url.trim();
        if title.is_empty() && url.is_empty() {
            // Unusable before windowing; count against both reasons.
            stats.no_title += 1;
            stats.no_url += 1;
            continue;
        }
        if title.is_empty() {
            stats.no_title += 1;
            continue;
        }
        if url.is_empty() {
            stats.no_url += 1;
            continue;
        }
        let date = match coerce_date(&item.date) {
            Some(d) => d,
            None => {
                stats.no_date += 1;
                continue;
            }
        };
        if !window.contains(date) {
            stats.outside += 1;
            continue;
        }
        stats.inside += 1;

        let canonical = canonicalize_url(url, None);
        let key = if canonical.is_empty() {
            format!("{date}|{title}")
        } else {
            canonical.clone()
        };
        if !seen.insert(key) {
            stats.dupes += 1;
            tracing::debug!(canonical = %canonical, "dedupe: skipping duplicate");
            continue;
        }

        kept.push(Entity {
            source: source.to_string(),
            doc_type: if item.doc_type.is_empty() {
                "news_article".to_string()
            } else {
                item.doc_type.clone()
            },
            title: title.to_string(),
            url: url.to_string(),
            canonical_url: canonical,
            summary_url: item.summary_url.clone(),
            summary: item.summary.clone(),
            post_date: Some(date),
            raw_line: if item.raw_line.is_empty() {
                format!("[{source}] {title} ({date})")
            } else {
                item.raw_line.clone()
            },
        });
    }

    stats.kept = kept.len();
    (kept, stats)
}
