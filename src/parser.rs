use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// One parsed event block from an extraction reply.
///
/// `date` stays a string: the merger re-validates it, and a malformed date
/// must survive parsing so it can be counted rather than silently dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub date: String,
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub why_relevant: String,
    /// All URLs attributable to the event: the block's own, any from the
    /// Source line, and the article URL when distinct.
    #[serde(default)]
    pub sources: Vec<String>,
    #[serde(default)]
    pub attacks: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

// Header line, with or without the leading "===". The em dash is
// load-bearing; the marker's trailing whitespace must not cross a newline,
// or a bare "===" line would swallow the header that follows it.
static HEADER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^(?:===[ \t]*)?(\d{4}-\d{2}-\d{2})\s+\u{2014}\s+(.+)$").expect("valid regex"));
static ATTACKS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)^"?attacks"?\s*:\s*(.+)$"#).expect("valid regex"));
static URL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"https?://\S+").expect("valid regex"));
static SUMMARY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^Summary:\s*(.*)$").expect("valid regex"));
static SOURCE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^Source:\s*(.*)$").expect("valid regex"));
static CATEGORY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^Category:\s*(.*)$").expect("valid regex"));
static WHY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^Why Relevant:\s*(.*)$").expect("valid regex"));

/// Normalize an attacks field value to a list of handles.
///
/// Accepts `[a, b]`, `a, b`, quoted tokens, and semicolon separators;
/// tokens come out lowercase with spaces collapsed to underscores.
pub fn normalize_attack_tokens(raw: &str) -> Vec<String> {
    let mut cleaned = raw.trim();
    if cleaned.starts_with('[') && cleaned.ends_with(']') {
        cleaned = cleaned[1..cleaned.len() - 1].trim();
    }
    cleaned
        .split([',', ';'])
        .filter_map(|part| {
            let t = part.trim().trim_matches('"').trim_matches('\'').trim();
            if t.is_empty() {
                None
            } else {
                Some(t.to_lowercase().replace(' ', "_"))
            }
        })
        .collect()
}

/// Parse canonical blocks of the form:
///
/// ```text
/// [optional ===] YYYY-MM-DD — Event title
/// [optional direct URL line]
/// Summary: ...
/// Source: ...
/// Category: ...
/// Why Relevant: ...
/// attacks: [a, b]
/// ```
///
/// Footer lines and anything before the first header are ignored. Events
/// without a usable URL inherit `article_url`.
pub fn parse_event_blocks(text: &str, article_url: &str) -> Vec<EventRecord> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    let headers: Vec<_> = HEADER_RE.find_iter(text).collect();
    if headers.is_empty() {
        tracing::debug!(head = %text.chars().take(200).collect::<String>(), "no header lines matched");
        return Vec::new();
    }

    let mut events = Vec::with_capacity(headers.len());
    for (idx, m) in headers.iter().enumerate() {
        let end = headers.get(idx + 1).map_or(text.len(), |n| n.start());
        let block = text[m.start()..end].trim();
        let lines: Vec<&str> = block
            .lines()
            .map(str::trim_end)
            .filter(|l| !l.trim().is_empty())
            .collect();
        if lines.is_empty() {
            continue;
        }

        let caps = match HEADER_RE.captures(lines[0]) {
            Some(c) => c,
            None => continue,
        };
        let date = caps[1].trim().to_string();
        let title = caps[2].trim().to_string();

        let mut i = 1;
        let mut url = String::new();
        if let Some(line) = lines.get(i) {
            let t = line.trim();
            if t.starts_with("http://") || t.starts_with("https://") {
                url = t.to_string();
                i += 1;
            }
        }

        let mut summary = String::new();
        let mut category = String::new();
        let mut why = String::new();
        let mut source_line = String::new();
        let mut attacks: Vec<String> = Vec::new();
        for line in &lines[i..] {
            if let Some(c) = SUMMARY_RE.captures(line) {
                summary = c[1].trim().to_string();
            } else if let Some(c) = CATEGORY_RE.captures(line) {
                category = c[1].trim().to_string();
            } else if let Some(c) = WHY_RE.captures(line) {
                why = c[1].trim().to_string();
            } else if let Some(c) = SOURCE_RE.captures(line) {
                source_line = c[1].trim().to_string();
            } else if let Some(c) = ATTACKS_RE.captures(line) {
                attacks = normalize_attack_tokens(c[1].trim());
            }
        }

        let source_urls: Vec<String> = URL_RE
            .find_iter(&source_line)
            .map(|m| m.as_str().to_string())
            .collect();
        if url.is_empty() {
            if let Some(first) = source_urls.first() {
                url = first.clone();
            }
        }
        if url.is_empty() {
            url = article_url.to_string();
        }

        let mut sources: Vec<String> = Vec::new();
        if !url.is_empty() {
            sources.push(url.clone());
        }
        for u in source_urls {
            if !sources.contains(&u) {
                sources.push(u);
            }
        }
        if !article_url.is_empty() && !sources.iter().any(|s| s == article_url) {
            sources.push(article_url.to_string());
        }

        tracing::debug!(
            %date,
            title = %title.chars().take(120).collect::<String>(),
            has_summary = !summary.is_empty(),
            %category,
            attacks = attacks.len(),
            "parsed event block"
        );

        events.push(EventRecord {
            date,
            title,
            url,
            summary,
            category,
            why_relevant: why,
            sources,
            attacks,
            tags: Vec::new(),
        });
    }

    tracing::debug!(total = events.len(), "parsed event blocks");
    events
}
