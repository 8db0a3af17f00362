use std::path::{Path, PathBuf};

use chrono::Utc;
use ollama_rs::generation::chat::ChatMessage;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::FailureReason;
use crate::http::{HttpClient, fetch_article_text};
use crate::llm::{CompletionClient, collect_reply};

/// Hard cap on the article body handed to the model.
pub const MAX_BODY_CHARS: usize = 200_000;

// Conservative context-budget bookkeeping for issue inference only.
const PROVIDER_TOKEN_CAP: usize = 16_000;
const DEFAULT_MAX_OUTPUT_TOKENS: usize = 6_000;

const RETRY_SENTINEL: &str = "RETRY_SCHEMA";

const RETRY_INSTRUCTION: &str = "Your previous output failed the Canonical Extraction Protocol.\n\
Re-emit the ENTIRE output now EXACTLY per schema with:\n\
1) BEGIN LOG / END OF LOG delimiters\n\
2) For every event: a 'Category:' line and a 'Why Relevant:' line\n\
3) Plain TEXT only (no JSON, no code fences, no commentary)\n\
Do not summarize. Do not explain. Output the corrected log only.";

/// When to write per-item debug artifacts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DebugPolicy {
    Never,
    /// Write only for fetch/schema failures. The default.
    Failures,
    /// Failures plus a random sample of successes at the given rate.
    Sample(f64),
    Always,
}

impl Default for DebugPolicy {
    fn default() -> Self {
        DebugPolicy::Failures
    }
}

impl DebugPolicy {
    /// Parse a CLI policy string; `sample` uses `rate` (clamped to [0, 1]).
    pub fn parse(s: &str, rate: f64) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "never" => DebugPolicy::Never,
            "sample" => DebugPolicy::Sample(rate.clamp(0.0, 1.0)),
            "always" => DebugPolicy::Always,
            _ => DebugPolicy::Failures,
        }
    }
}

/// Per-item artifact writer; all debug writes go through here so the policy
/// is applied in exactly one place. Write failures are swallowed — debug
/// output must never abort extraction.
struct DebugWriter {
    base: PathBuf,
    policy: DebugPolicy,
    sample_hit: bool,
}

impl DebugWriter {
    fn new(base: PathBuf, policy: DebugPolicy) -> Self {
        let sample_hit = match policy {
            DebugPolicy::Sample(rate) => rand::random::<f64>() < rate,
            _ => false,
        };
        Self {
            base,
            policy,
            sample_hit,
        }
    }

    fn should(&self, is_failure: bool, force: bool) -> bool {
        match self.policy {
            DebugPolicy::Never => false,
            _ if force => true,
            DebugPolicy::Always => true,
            DebugPolicy::Failures => is_failure,
            DebugPolicy::Sample(_) => is_failure || self.sample_hit,
        }
    }

    fn path(&self, suffix: &str) -> PathBuf {
        let mut name = self
            .base
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        name.push_str(suffix);
        self.base.with_file_name(name)
    }

    fn text(&self, suffix: &str, body: &str, is_failure: bool, force: bool) {
        if !self.should(is_failure, force) {
            return;
        }
        let p = self.path(suffix);
        if let Some(parent) = p.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        if let Err(e) = std::fs::write(&p, body) {
            tracing::debug!(path = %p.display(), error = %e, "debug write failed");
        }
    }

    fn json<T: Serialize>(&self, suffix: &str, obj: &T, is_failure: bool, force: bool) {
        if !self.should(is_failure, force) {
            return;
        }
        if let Ok(body) = serde_json::to_string_pretty(obj) {
            self.text(suffix, &body, is_failure, force);
        }
    }
}

static EVENT_HEADER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*\d{4}-\d{2}-\d{2}\s+\u{2014}\s+.+$").expect("valid regex"));
static TOTAL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Total events found:\s*\[\d+\]").expect("valid regex"));
static CATEGORY_LINE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^Category:\s*.+$").expect("valid regex"));
static WHY_LINE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^Why Relevant:\s*.+$").expect("valid regex"));
static ATTACKS_LINE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?mi)^"?attacks"?\s*:\s*.+$"#).expect("valid regex"));

/// Cheap pre-parse scan of an extraction reply; persisted into debug
/// artifacts and used to decide the schema retry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ComplianceScan {
    pub has_footer_end_of_log: bool,
    pub has_total_events: bool,
    pub count_category_lines: usize,
    pub count_why_lines: usize,
    pub count_attacks_lines: usize,
    pub detected_event_blocks: usize,
}

pub fn compliance_scan(text: &str) -> ComplianceScan {
    if text.is_empty() {
        return ComplianceScan::default();
    }
    ComplianceScan {
        has_footer_end_of_log: text.contains("[END OF LOG]"),
        has_total_events: TOTAL_RE.is_match(text),
        count_category_lines: CATEGORY_LINE_RE.find_iter(text).count(),
        count_why_lines: WHY_LINE_RE.find_iter(text).count(),
        count_attacks_lines: ATTACKS_LINE_RE.find_iter(text).count(),
        detected_event_blocks: EVENT_HEADER_RE.find_iter(text).count(),
    }
}

/// A reply needs the single schema retry when it is empty, lacks the footer,
/// or has none of the mandatory labeled lines.
pub fn needs_schema_retry(text: &str) -> bool {
    if text.trim().is_empty() {
        return true;
    }
    let scan = compliance_scan(text);
    !scan.has_footer_end_of_log
        || scan.count_category_lines == 0
        || scan.count_why_lines == 0
        || scan.count_attacks_lines == 0
}

fn approx_tokens_from_chars(n: usize) -> usize {
    n.div_ceil(4).max(1)
}

/// Heuristic failure-cause code recorded in the debug artifact.
pub fn infer_issue(approx_room: usize, scan: &ComplianceScan) -> &'static str {
    if !scan.has_footer_end_of_log && approx_room < 200 {
        return "likely_truncation_or_token_budget";
    }
    if scan.has_footer_end_of_log && (scan.count_category_lines == 0 || scan.count_why_lines == 0) {
        return "schema_drift_missing_fields";
    }
    if scan.count_category_lines + scan.count_why_lines == 0 && !scan.has_footer_end_of_log {
        return "no_schema_fields_detected";
    }
    "unknown_or_ok"
}

fn head_tail(s: &str, head: usize, tail: usize) -> (String, String) {
    let h: String = s.chars().take(head).collect();
    let t: String = if s.chars().count() > tail {
        let skip = s.chars().count() - tail;
        s.chars().skip(skip).collect()
    } else {
        s.to_string()
    };
    (h, t)
}

fn sha256_hex(s: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(s.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Build the (system, user) messages for one item.
///
/// The builder supplies the composed system prompt; this function attaches
/// the URL/title/date header, a format reminder, and the truncated body.
pub fn build_messages(
    article_url: &str,
    article_text: &str,
    system_prompt: &str,
    article_title: Option<&str>,
    article_date: Option<&str>,
) -> Vec<ChatMessage> {
    let body: String = article_text.chars().take(MAX_BODY_CHARS).collect();

    let system = if system_prompt.trim().is_empty() {
        "You will extract democracy-affecting events from the provided ARTICLE_TEXT. \
         Follow the user message's explicit schema exactly."
            .to_string()
    } else {
        system_prompt.trim().to_string()
    };

    let mut header = Vec::new();
    if let Some(d) = article_date {
        header.push(format!("ARTICLE_DATE: {d}"));
    }
    if let Some(t) = article_title {
        header.push(format!("ARTICLE_TITLE: {t}"));
    }
    header.push(format!("ARTICLE_URL: {article_url}"));

    let reminder = "FORMAT REMINDER:\n\
Return plain TEXT using the exact schema in the Canonical Extraction Protocol.\n\
Do NOT use JSON, markdown code fences, or alternative formats.\n";

    let user = format!("{}\n\n{}\nARTICLE_TEXT:\n{}", header.join("\n"), reminder, body);
    vec![ChatMessage::system(system), ChatMessage::user(user)]
}

/// The tagged result of one extraction attempt.
#[derive(Debug, Clone)]
pub enum ExtractionOutcome {
    /// The best-available reply. `schema_ok` is false when even the retry
    /// failed the compliance scan; the text is then the first reply, which
    /// often still holds parseable blocks (e.g. a truncated footer), so it
    /// goes to the parser rather than being dropped.
    Reply {
        text: String,
        finish_reason: Option<String>,
        attempts: u32,
        schema_ok: bool,
    },
    /// Nothing usable; the reason lands in the envelope's noncompliant list.
    Failed { reason: FailureReason, detail: String },
}

#[derive(Serialize)]
struct DebugRecord<'a> {
    phase: &'a str,
    url: &'a str,
    article_title: Option<&'a str>,
    article_date: Option<&'a str>,
    system_prompt_chars: usize,
    user_prompt_chars: usize,
    approx_input_tokens: usize,
    approx_room_for_output_tokens: usize,
    response_chars: usize,
    response_head: String,
    response_tail: String,
    compliance: &'a ComplianceScan,
    inferred_issue: &'a str,
    attempt: u32,
}

/// Extract events from already-fetched text: build messages, call the model,
/// apply the single schema retry, and write policy-gated debug artifacts.
#[allow(clippy::too_many_arguments)]
pub async fn extract_events_from_text(
    llm: &dyn CompletionClient,
    article_text: &str,
    system_prompt: &str,
    article_url: &str,
    article_title: Option<&str>,
    article_date: Option<&str>,
    idx: usize,
    log_dir: &Path,
    policy: DebugPolicy,
) -> ExtractionOutcome {
    let stamp = Utc::now().format("%Y%m%d-%H%M%S");
    let base = log_dir.join(format!("extract_{stamp}_idx{idx}"));
    let dbg = DebugWriter::new(base, policy);

    if article_text.trim().is_empty() {
        dbg.text(".article_text.txt", article_text, true, false);
        return ExtractionOutcome::Failed {
            reason: FailureReason::EmptyBody,
            detail: format!("no usable body text for {article_url}"),
        };
    }

    let messages = build_messages(article_url, article_text, system_prompt, article_title, article_date);
    let user_msg = messages
        .last()
        .map(|m| m.content.clone())
        .unwrap_or_default();

    let system_chars = system_prompt.trim().chars().count();
    let user_chars = user_msg.chars().count();
    let approx_in = approx_tokens_from_chars(system_chars + user_chars);
    let approx_room = PROVIDER_TOKEN_CAP
        .saturating_sub(approx_in)
        .saturating_sub(DEFAULT_MAX_OUTPUT_TOKENS);

    tracing::debug!(
        url = article_url,
        user_chars,
        system_chars,
        approx_in,
        approx_room,
        "built extraction messages"
    );
    dbg.text(".system_prompt.txt", system_prompt, false, false);
    dbg.text(".article_text.txt", article_text, false, false);
    dbg.text(".user_message.txt", &user_msg, false, false);

    let reply = match collect_reply(llm, &messages).await {
        Ok(r) => r,
        Err(e) => {
            dbg.text(".llm_response.txt", &format!("(service error: {e})"), true, false);
            return ExtractionOutcome::Failed {
                reason: FailureReason::ServiceError,
                detail: e.to_string(),
            };
        }
    };

    let text = reply.text.trim().to_string();
    let scan = compliance_scan(&text);
    let issue = infer_issue(approx_room, &scan);
    let is_fail = needs_schema_retry(&text) || text == RETRY_SENTINEL;
    let (head, tail) = head_tail(&text, 600, 400);
    dbg.text(".llm_response.txt", &text, is_fail, false);
    dbg.json(
        ".debug.json",
        &DebugRecord {
            phase: "postcall",
            url: article_url,
            article_title,
            article_date,
            system_prompt_chars: system_chars,
            user_prompt_chars: user_chars,
            approx_input_tokens: approx_in,
            approx_room_for_output_tokens: approx_room,
            response_chars: text.chars().count(),
            response_head: head,
            response_tail: tail,
            compliance: &scan,
            inferred_issue: issue,
            attempt: 1,
        },
        is_fail,
        false,
    );

    if !is_fail {
        return ExtractionOutcome::Reply {
            text,
            finish_reason: reply.finish_reason,
            attempts: 1,
            schema_ok: true,
        };
    }

    tracing::warn!(url = article_url, issue, "reply failed compliance scan; retrying once");
    let mut retry_messages = messages;
    retry_messages.push(ChatMessage::user(RETRY_INSTRUCTION.to_string()));

    let retry = match collect_reply(llm, &retry_messages).await {
        Ok(r) => r,
        Err(e) => {
            return ExtractionOutcome::Failed {
                reason: FailureReason::ServiceError,
                detail: e.to_string(),
            };
        }
    };

    let retry_text = retry.text.trim().to_string();
    let retry_scan = compliance_scan(&retry_text);
    let retry_fail = needs_schema_retry(&retry_text);
    let (head, tail) = head_tail(&retry_text, 600, 400);
    dbg.text(".llm_response_retry1.txt", &retry_text, true, false);
    dbg.json(
        ".debug_retry1.json",
        &DebugRecord {
            phase: "postcall",
            url: article_url,
            article_title,
            article_date,
            system_prompt_chars: system_chars,
            user_prompt_chars: user_chars,
            approx_input_tokens: approx_in,
            approx_room_for_output_tokens: approx_room,
            response_chars: retry_text.chars().count(),
            response_head: head,
            response_tail: tail,
            compliance: &retry_scan,
            inferred_issue: infer_issue(approx_room, &retry_scan),
            attempt: 2,
        },
        retry_fail,
        false,
    );

    if retry_fail {
        // Keep the first reply: a scan failure is often just a missing
        // footer, and the blocks above it still parse.
        tracing::warn!(url = article_url, issue, "retry also failed the scan; keeping first reply");
        return ExtractionOutcome::Reply {
            text,
            finish_reason: reply.finish_reason,
            attempts: 2,
            schema_ok: false,
        };
    }

    ExtractionOutcome::Reply {
        text: retry_text,
        finish_reason: retry.finish_reason,
        attempts: 2,
        schema_ok: true,
    }
}

/// Fetch an article and extract events from it. A failed or empty fetch
/// never reaches the model.
#[allow(clippy::too_many_arguments)]
pub async fn extract_events_from_url(
    llm: &dyn CompletionClient,
    http: &HttpClient,
    url: &str,
    system_prompt: &str,
    article_title: Option<&str>,
    article_date: Option<&str>,
    idx: usize,
    log_dir: &Path,
    policy: DebugPolicy,
) -> ExtractionOutcome {
    let (text, status) = fetch_article_text(http, url).await;
    tracing::info!(
        url,
        status,
        chars = text.len(),
        sha256 = %sha256_hex(&text),
        "fetched article"
    );
    if status != 200 || text.trim().is_empty() {
        return ExtractionOutcome::Failed {
            reason: FailureReason::FetchFailed,
            detail: format!("fetch failed for {url} with status {status}"),
        };
    }
    extract_events_from_text(
        llm,
        &text,
        system_prompt,
        url,
        article_title,
        article_date,
        idx,
        log_dir,
        policy,
    )
    .await
}
