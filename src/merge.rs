use std::collections::BTreeMap;

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;

use crate::attacks::humanize_attacks;
use crate::entity::coerce_date;
use crate::envelope::ArtifactPaths;
use crate::error::PipelineError;
use crate::window::{Window, week_for};

/// Canonical category order for the master log; unknown categories rank
/// after these, blanks last of all.
pub const CATEGORY_ORDER: [&str; 12] = [
    "Executive Actions & Orders",
    "Legislative & Oversight Activity",
    "Judicial Developments",
    "Law Enforcement & Surveillance",
    "Elections & Representation",
    "Civil Society & Protest",
    "Information & Media Control",
    "Economic & Regulatory Power",
    "Appointments & Patronage",
    "Transparency & Records",
    "International Relations",
    "Civil–Military Relations & State Violence",
];

pub fn category_rank(category: &str) -> usize {
    if category.is_empty() {
        return CATEGORY_ORDER.len() + 1;
    }
    CATEGORY_ORDER
        .iter()
        .position(|c| *c == category)
        .unwrap_or(CATEGORY_ORDER.len())
}

/// Tolerant date read for merge rows: ISO (possibly embedded), slash form,
/// and short or long month names.
pub fn safe_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    for fmt in ["%Y-%m-%d", "%Y/%m/%d", "%b %d, %Y", "%B %d, %Y"] {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Some(d);
        }
    }
    coerce_date(s)
}

/// One normalized event row, ready for sorting and rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeRow {
    pub source_key: String,
    /// Canonical ISO string when parseable, else the original text (or "").
    pub date_iso: String,
    pub date: Option<NaiveDate>,
    pub category: String,
    pub title: String,
    pub source_label: String,
    pub url: String,
    pub summary: String,
    pub why: String,
    pub attacks: Vec<String>,
    pub origin_file: String,
    pub origin_index: usize,
}

fn value_str(e: &Value, keys: &[&str]) -> String {
    for k in keys {
        if let Some(s) = e.get(*k).and_then(Value::as_str) {
            let s = s.trim();
            if !s.is_empty() {
                return s.to_string();
            }
        }
    }
    String::new()
}

fn value_attacks(e: &Value) -> Vec<String> {
    match e.get("attacks") {
        Some(Value::Array(list)) => list
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        Some(Value::String(s)) if !s.trim().is_empty() => vec![s.trim().to_string()],
        _ => Vec::new(),
    }
}

/// Normalize one event object from a per-source envelope, reading keys
/// tolerantly so older producers still merge. `strict` drops rows missing
/// any of title/summary/category/why instead of rendering blanks.
pub fn normalize_row(
    e: &Value,
    source_key: &str,
    origin_file: &str,
    origin_index: usize,
    strict: bool,
) -> Option<MergeRow> {
    let raw_date = value_str(e, &["date", "event_date", "source_date", "post_date"]);
    let title = value_str(e, &["title"]);
    let summary = value_str(e, &["summary"]);
    let category = value_str(e, &["category"]);
    let why = value_str(e, &["why_relevant", "why"]);
    let url = value_str(e, &["url", "canonical_url"]);
    let mut source_label = value_str(e, &["publication", "source"]);
    if source_label.is_empty() {
        source_label = source_key.to_string();
    }

    let date = safe_date(&raw_date);
    let date_iso = match date {
        Some(d) => d.to_string(),
        None => raw_date,
    };

    if strict && (title.is_empty() || summary.is_empty() || category.is_empty() || why.is_empty()) {
        tracing::warn!(origin_file, origin_index, %title, %category, "strict drop: missing fields");
        return None;
    }

    Some(MergeRow {
        source_key: source_key.to_string(),
        date_iso,
        date,
        category,
        title,
        source_label,
        url,
        summary,
        why,
        attacks: value_attacks(e),
        origin_file: origin_file.to_string(),
        origin_index,
    })
}

/// Canonical sort: date ascending with missing dates last, then category
/// rank, then source, then title. Total and deterministic.
pub fn sort_rows(rows: &mut [MergeRow]) {
    rows.sort_by(|a, b| {
        let da = a.date.unwrap_or(NaiveDate::MAX);
        let db = b.date.unwrap_or(NaiveDate::MAX);
        da.cmp(&db)
            .then_with(|| category_rank(&a.category).cmp(&category_rank(&b.category)))
            .then_with(|| a.source_key.to_lowercase().cmp(&b.source_key.to_lowercase()))
            .then_with(|| a.title.to_lowercase().cmp(&b.title.to_lowercase()))
    });
}

fn render_event(row: &MergeRow, out: &mut String) {
    let title = if row.title.is_empty() {
        "(untitled)"
    } else {
        row.title.as_str()
    };
    out.push_str(&format!("=== {} — {}\n", row.date_iso, title));
    if !row.url.is_empty() {
        out.push_str(&row.url);
        out.push('\n');
    }
    out.push_str(&format!("Summary: {}\n", row.summary));
    out.push_str(&format!("Source: {}\n", row.source_label));
    out.push_str(&format!("Category: {}\n", row.category));
    out.push_str(&format!("Why Relevant: {}\n", row.why));
    if row.attacks.is_empty() {
        out.push_str("Attacks: []\n");
    } else {
        out.push_str(&format!("Attacks: {}\n", humanize_attacks(&row.attacks)));
    }
}

fn count_by<F: Fn(&MergeRow) -> String>(rows: &[MergeRow], f: F) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for row in rows {
        *counts.entry(f(row)).or_insert(0) += 1;
    }
    counts
}

fn rollup_block(title: &str, counts: &BTreeMap<String, usize>, order: &[String], out: &mut String) {
    out.push_str(title);
    out.push('\n');
    if counts.is_empty() {
        out.push_str("(none)\n");
        return;
    }
    for key in order {
        let label = if key.is_empty() { "(no date)" } else { key };
        out.push_str(&format!("- {}: {}\n", label, counts[key]));
    }
}

/// Render the full text log: header, sorted blocks, rollup footer.
pub fn render_master_log(
    rows: &[MergeRow],
    window: Window,
    sources: &[String],
    with_header: bool,
    with_footer: bool,
) -> String {
    let mut out = String::new();
    if with_header {
        out.push_str("MASTER EVENT LOG\n");
        out.push_str(&format!("Window: {window}\n"));
        out.push_str(&format!(
            "Sources: {}\n",
            if sources.is_empty() {
                "(none)".to_string()
            } else {
                sources.join(", ")
            }
        ));
        out.push_str(&format!("Total events (written): {}\n\n", rows.len()));
    }
    for row in rows {
        render_event(row, &mut out);
        out.push('\n');
    }
    if with_footer {
        let by_date = count_by(rows, |r| r.date_iso.clone());
        let by_source = count_by(rows, |r| r.source_key.clone());
        let by_cat = count_by(rows, |r| r.category.clone());

        // Dates ascending, blanks last.
        let mut date_keys: Vec<String> = by_date.keys().cloned().filter(|k| !k.is_empty()).collect();
        if by_date.contains_key("") {
            date_keys.push(String::new());
        }
        let source_keys: Vec<String> = by_source.keys().cloned().collect();
        let mut cat_keys: Vec<String> = by_cat.keys().cloned().collect();
        cat_keys.sort_by_key(|c| (category_rank(c), c.clone()));

        out.push('\n');
        rollup_block("Summary by Date:", &by_date, &date_keys, &mut out);
        out.push('\n');
        rollup_block("Summary by Source:", &by_source, &source_keys, &mut out);
        out.push('\n');
        rollup_block("Summary by Category:", &by_cat, &cat_keys, &mut out);
        out.push('\n');
        out.push_str("[END OF MASTER LOG]\n");
    }
    out.trim_end().to_string() + "\n"
}

#[derive(Debug, Serialize)]
struct IndexEvent<'a> {
    source_key: &'a str,
    date: &'a str,
    category: &'a str,
    title: &'a str,
    url: &'a str,
    summary: &'a str,
    why_relevant: &'a str,
    attacks: &'a [String],
    #[serde(rename = "_origin_file")]
    origin_file: &'a str,
    #[serde(rename = "_origin_index")]
    origin_index: usize,
}

#[derive(Debug, Serialize)]
struct IndexCounts {
    total: usize,
    by_date: BTreeMap<String, usize>,
    by_source: BTreeMap<String, usize>,
    by_category: BTreeMap<String, usize>,
}

#[derive(Debug, Serialize)]
struct MasterIndex<'a> {
    window: Window,
    #[serde(skip_serializing_if = "Option::is_none")]
    week_number: Option<u32>,
    sources: Vec<String>,
    counts: IndexCounts,
    events: Vec<IndexEvent<'a>>,
}

fn build_index<'a>(
    rows: &'a [MergeRow],
    window: Window,
    week_number: Option<u32>,
    sources: Vec<String>,
) -> MasterIndex<'a> {
    MasterIndex {
        window,
        week_number,
        sources,
        counts: IndexCounts {
            total: rows.len(),
            by_date: count_by(rows, |r| r.date_iso.clone()),
            by_source: count_by(rows, |r| r.source_key.clone()),
            by_category: count_by(rows, |r| r.category.clone()),
        },
        events: rows
            .iter()
            .map(|r| IndexEvent {
                source_key: &r.source_key,
                date: &r.date_iso,
                category: &r.category,
                title: &r.title,
                url: &r.url,
                summary: &r.summary,
                why_relevant: &r.why,
                attacks: &r.attacks,
                origin_file: &r.origin_file,
                origin_index: r.origin_index,
            })
            .collect(),
    }
}

static EVENTS_FILE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(.+)_events_(\d{4}-\d{2}-\d{2})_(\d{4}-\d{2}-\d{2})\.json$").expect("valid regex"));

/// Discover `{source}_events_{start}_{end}.json` files for a window,
/// returning `(source, path)` pairs sorted by file name.
pub fn discover_event_files(
    paths: &ArtifactPaths,
    window: Window,
) -> Result<Vec<(String, std::path::PathBuf)>, PipelineError> {
    let dir = paths.root().join("eventjson");
    let mut found = Vec::new();
    if !dir.exists() {
        return Ok(found);
    }
    let suffix = format!("_events_{}_{}.json", window.start, window.end);
    for entry in std::fs::read_dir(&dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if !name.ends_with(&suffix) {
            continue;
        }
        if let Some(caps) = EVENTS_FILE_RE.captures(&name) {
            found.push((caps[1].to_string(), entry.path()));
        }
    }
    found.sort_by(|a, b| a.1.file_name().cmp(&b.1.file_name()));
    Ok(found)
}

fn want_source(source: &str, only: &[String], skip: &[String]) -> bool {
    if !only.is_empty() {
        return only.iter().any(|s| s == source);
    }
    !skip.iter().any(|s| s == source)
}

#[derive(Debug, Clone, Default)]
pub struct MergeOptions {
    pub only: Vec<String>,
    pub skip: Vec<String>,
    /// Keep only the first N rows after sorting, for QA runs.
    pub preview: Option<usize>,
    pub strict: bool,
    pub no_header: bool,
    pub no_footer: bool,
}

#[derive(Debug, Clone)]
pub struct MergeSummary {
    pub sources: Vec<String>,
    pub events_written: usize,
    pub weekly_files: usize,
}

/// Merge every per-source envelope for the window into the master text log
/// and index JSON, splitting a weekly index per calendar week when the
/// window spans more than one.
pub fn run_merge(
    paths: &ArtifactPaths,
    window: Window,
    opts: &MergeOptions,
) -> Result<MergeSummary, PipelineError> {
    paths.ensure_dirs()?;
    let files = discover_event_files(paths, window)?;
    if files.is_empty() {
        tracing::warn!(window = %window, "no event JSON files found for window");
    }
    let selected: Vec<_> = files
        .into_iter()
        .filter(|(src, _)| want_source(src, &opts.only, &opts.skip))
        .collect();
    let sources: Vec<String> = selected.iter().map(|(s, _)| s.clone()).collect();
    tracing::info!(sources = sources.join(" "), "selected sources");

    let mut rows: Vec<MergeRow> = Vec::new();
    for (source, path) in &selected {
        let payload: Value = match crate::envelope::read_json(path) {
            Ok(v) => v,
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "failed to read envelope");
                continue;
            }
        };
        let events = payload
            .get("events")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        tracing::info!(source, file = %file_name, events = events.len(), "loaded envelope");
        for (i, e) in events.iter().enumerate() {
            if let Some(row) = normalize_row(e, source, &file_name, i, opts.strict) {
                rows.push(row);
            }
        }
    }

    sort_rows(&mut rows);
    if let Some(n) = opts.preview {
        rows.truncate(n);
    }

    let txt = render_master_log(&rows, window, &sources, !opts.no_header, !opts.no_footer);
    let txt_path = paths.master_txt(window);
    std::fs::write(&txt_path, &txt)?;
    tracing::info!(path = %txt_path.display(), events = rows.len(), "wrote master event log");

    let index = build_index(&rows, window, None, sources.clone());
    crate::envelope::write_json(&paths.master_index(window), &index)?;

    // Weekly split, only when more than one week is represented.
    let mut week_groups: BTreeMap<u32, Vec<MergeRow>> = BTreeMap::new();
    let mut week_bounds: BTreeMap<u32, Window> = BTreeMap::new();
    for row in &rows {
        let Some(date) = row.date else { continue };
        let Some(span) = week_for(date) else { continue };
        week_groups.entry(span.number).or_default().push(row.clone());
        week_bounds.insert(
            span.number,
            Window {
                start: span.start,
                end: span.end,
            },
        );
    }
    let mut weekly_files = 0;
    if week_groups.len() > 1 {
        for (number, group) in &week_groups {
            let bounds = week_bounds[number];
            let mut week_sources: Vec<String> =
                group.iter().map(|r| r.source_key.clone()).collect();
            week_sources.sort();
            week_sources.dedup();
            let index = build_index(group, bounds, Some(*number), week_sources);
            crate::envelope::write_json(&paths.weekly_index(*number, bounds), &index)?;
            weekly_files += 1;
        }
        tracing::info!(weekly_files, "wrote weekly index files");
    }

    Ok(MergeSummary {
        sources,
        events_written: rows.len(),
        weekly_files,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(date: &str, cat: &str, source: &str, title: &str) -> MergeRow {
        normalize_row(
            &json!({
                "date": date,
                "title": title,
                "summary": "s",
                "category": cat,
                "why_relevant": "w",
                "url": "https://x.example/1",
            }),
            source,
            "f.json",
            0,
            false,
        )
        .unwrap()
    }

    #[test]
    fn category_ranks_follow_canonical_order() {
        assert_eq!(category_rank("Executive Actions & Orders"), 0);
        assert_eq!(
            category_rank("Civil–Military Relations & State Violence"),
            11
        );
        assert_eq!(category_rank("Made Up Category"), 12);
        assert_eq!(category_rank(""), 13);
    }

    #[test]
    fn sort_is_date_then_category_then_source_then_title() {
        let mut rows = vec![
            row("2025-01-26", "Judicial Developments", "b", "t"),
            row("2025-01-25", "Judicial Developments", "a", "t"),
            row("2025-01-25", "Executive Actions & Orders", "z", "t"),
            row("", "Executive Actions & Orders", "a", "t"),
            row("2025-01-25", "Judicial Developments", "a", "s"),
        ];
        sort_rows(&mut rows);
        assert_eq!(rows[0].source_key, "z"); // earliest date, first category
        assert_eq!(rows[1].title, "s"); // same date+cat+source, title tiebreak
        assert_eq!(rows[2].title, "t");
        assert_eq!(rows[3].date_iso, "2025-01-26");
        assert_eq!(rows[4].date_iso, ""); // missing date sorts last
    }

    #[test]
    fn tolerant_key_reads() {
        let r = normalize_row(
            &json!({
                "source_date": "2025-01-25",
                "title": "t",
                "summary": "s",
                "category": "c",
                "why": "w",
                "canonical_url": "https://x.example/2",
                "publication": "Zeteo",
                "attacks": "courts",
            }),
            "zeteo",
            "f.json",
            4,
            false,
        )
        .unwrap();
        assert_eq!(r.date_iso, "2025-01-25");
        assert_eq!(r.url, "https://x.example/2");
        assert_eq!(r.source_label, "Zeteo");
        assert_eq!(r.why, "w");
        assert_eq!(r.attacks, vec!["courts"]);
        assert_eq!(r.origin_index, 4);
    }

    #[test]
    fn strict_mode_drops_incomplete_rows() {
        let e = json!({"date": "2025-01-25", "title": "t", "summary": "", "category": "c", "why": "w"});
        assert!(normalize_row(&e, "s", "f", 0, true).is_none());
        assert!(normalize_row(&e, "s", "f", 0, false).is_some());
    }

    #[test]
    fn unparseable_dates_keep_their_original_text() {
        let r = normalize_row(
            &json!({"date": "sometime soon", "title": "t", "summary": "s", "category": "c", "why": "w"}),
            "s",
            "f",
            0,
            false,
        )
        .unwrap();
        assert_eq!(r.date_iso, "sometime soon");
        assert!(r.date.is_none());
    }

    #[test]
    fn safe_date_accepts_month_names() {
        let want = NaiveDate::from_ymd_opt(2025, 1, 25).unwrap();
        assert_eq!(safe_date("Jan 25, 2025"), Some(want));
        assert_eq!(safe_date("January 25, 2025"), Some(want));
        assert_eq!(safe_date("2025/01/25"), Some(want));
        assert_eq!(safe_date("junk"), None);
    }

    #[test]
    fn rendered_log_has_header_blocks_and_footer() {
        let rows = vec![
            row("2025-01-25", "Judicial Developments", "zeteo", "Stay granted"),
            row("2025-01-26", "Executive Actions & Orders", "hcr", "Order signed"),
        ];
        let w = Window::resolve(
            Some("2025-01-25".parse().unwrap()),
            Some("2025-01-31".parse().unwrap()),
            None,
            None,
        )
        .unwrap();
        let txt = render_master_log(&rows, w, &["zeteo".into(), "hcr".into()], true, true);
        assert!(txt.starts_with("MASTER EVENT LOG\n"));
        assert!(txt.contains("=== 2025-01-25 — Stay granted"));
        assert!(txt.contains("Attacks: []"));
        assert!(txt.contains("Summary by Date:\n- 2025-01-25: 1\n- 2025-01-26: 1"));
        assert!(txt.contains("Summary by Category:\n- Executive Actions & Orders: 1\n- Judicial Developments: 1"));
        assert!(txt.trim_end().ends_with("[END OF MASTER LOG]"));
    }

    #[test]
    fn humanized_attacks_render_in_the_log() {
        let mut r = row("2025-01-25", "Judicial Developments", "zeteo", "t");
        r.attacks = vec!["courts".into(), "rule_of_law".into()];
        let mut out = String::new();
        render_event(&r, &mut out);
        assert!(out.contains("Attacks: The Courts, Rule of Law"));
    }

    #[test]
    fn only_and_skip_filters() {
        assert!(want_source("a", &[], &[]));
        assert!(want_source("a", &["a".into()], &[]));
        assert!(!want_source("b", &["a".into()], &[]));
        assert!(!want_source("a", &[], &["a".into()]));
    }
}
