use crate::entity;
use crate::envelope::{
    ArtifactPaths, EventsEnvelope, FilteredPack, NoncompliantItem, RawSnapshot, read_json,
    write_json,
};
use crate::error::{FailureReason, PipelineError};
use crate::extract::{DebugPolicy, ExtractionOutcome, extract_events_from_url};
use crate::http::HttpClient;
use crate::llm::CompletionClient;
use crate::merge::{MergeOptions, run_merge};
use crate::parser::parse_event_blocks;
use crate::prompts::compose_system_prompt;
use crate::sources::{DatePolicy, adapter_for, registry, spec_for};
use crate::window::Window;

/// Everything a stage needs, resolved up front. The library never reads
/// environment variables; the binary turns flags into one of these.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub paths: ArtifactPaths,
    pub window: Window,
    pub only: Vec<String>,
    pub skip: Vec<String>,
    pub debug_policy: DebugPolicy,
    /// Cap on entities extracted per source, for bounded QA runs.
    pub limit_per_source: Option<usize>,
}

impl PipelineConfig {
    /// Source keys this run operates on, in registry order. Unknown keys in
    /// `--only` are reported rather than silently dropped.
    pub fn selected_sources(&self) -> (Vec<&'static str>, Vec<String>) {
        let mut unknown = Vec::new();
        if !self.only.is_empty() {
            for key in &self.only {
                if registry().iter().all(|s| s.key != key) {
                    unknown.push(key.clone());
                }
            }
            let keys = registry()
                .iter()
                .map(|s| s.key)
                .filter(|k| self.only.iter().any(|o| o == k))
                .collect();
            return (keys, unknown);
        }
        let keys = registry()
            .iter()
            .map(|s| s.key)
            .filter(|k| !self.skip.iter().any(|s| s == k))
            .collect();
        (keys, unknown)
    }
}

/// How one source fared in a stage.
#[derive(Debug, Clone)]
pub struct SourceOutcome {
    pub source: String,
    pub ok: bool,
    pub detail: String,
}

/// Per-stage report; one failed source never aborts the others.
#[derive(Debug, Clone, Default)]
pub struct StageReport {
    pub outcomes: Vec<SourceOutcome>,
}

impl StageReport {
    fn ok(&mut self, source: &str, detail: String) {
        tracing::info!(source, %detail, "source complete");
        self.outcomes.push(SourceOutcome {
            source: source.to_string(),
            ok: true,
            detail,
        });
    }

    fn fail(&mut self, source: &str, detail: String) {
        tracing::error!(source, %detail, "source failed");
        self.outcomes.push(SourceOutcome {
            source: source.to_string(),
            ok: false,
            detail,
        });
    }

    pub fn any_failed(&self) -> bool {
        self.outcomes.iter().any(|o| !o.ok)
    }
}

/// Stage 1: discover candidate items per source, window and dedupe them,
/// and persist the raw snapshot plus the filtered entity pack.
pub async fn run_harvest(
    http: &HttpClient,
    cfg: &PipelineConfig,
) -> Result<StageReport, PipelineError> {
    cfg.paths.ensure_dirs()?;
    let mut report = StageReport::default();
    let (keys, unknown) = cfg.selected_sources();
    for key in unknown {
        report.fail(&key, "unknown source key".to_string());
    }

    for key in keys {
        let Some(adapter) = adapter_for(key) else {
            report.fail(key, "no adapter".to_string());
            continue;
        };
        let spec = *adapter.spec();
        let harvest = match adapter.discover(http, cfg.window).await {
            Ok(h) => h,
            Err(e) => {
                report.fail(key, format!("discovery failed: {e}"));
                continue;
            }
        };

        let snapshot = RawSnapshot {
            source: key.to_string(),
            window: cfg.window,
            archive_url: harvest.archive_url.clone(),
            parsed_total: harvest.snapshot.len(),
            items_snapshot: harvest.snapshot,
        };
        let (entities, stats) = entity::normalize(&harvest.matches, cfg.window, spec.label);
        let pack = FilteredPack::new(key, cfg.window, entities, stats);

        let write = write_json(&cfg.paths.raw(key, cfg.window), &snapshot)
            .and_then(|()| write_json(&cfg.paths.filtered(key, cfg.window), &pack));
        match write {
            Ok(()) => report.ok(
                key,
                format!(
                    "{} seen, {} kept",
                    snapshot.parsed_total, pack.count
                ),
            ),
            Err(e) => report.fail(key, format!("artifact write failed: {e}")),
        }
    }
    Ok(report)
}

/// Stage 2: run extraction over each source's filtered pack and write the
/// per-source events envelope. The composed system prompt is persisted
/// alongside the debug artifacts for audit.
pub async fn run_build(
    llm: &dyn CompletionClient,
    http: &HttpClient,
    cfg: &PipelineConfig,
) -> Result<StageReport, PipelineError> {
    cfg.paths.ensure_dirs()?;
    let mut report = StageReport::default();
    let (keys, unknown) = cfg.selected_sources();
    for key in unknown {
        report.fail(&key, "unknown source key".to_string());
    }

    for key in keys {
        let pack: FilteredPack = match read_json(&cfg.paths.filtered(key, cfg.window)) {
            Ok(p) => p,
            Err(e) => {
                report.fail(key, format!("no filtered pack: {e}"));
                continue;
            }
        };

        let date_policy = spec_for(key)
            .map(|s| s.date_policy)
            .unwrap_or(DatePolicy::PostDate);
        let system_prompt = compose_system_prompt(key, date_policy);
        if let Err(e) = std::fs::write(&cfg.paths.prompt(key, cfg.window), &system_prompt) {
            tracing::warn!(source = key, error = %e, "could not persist composed prompt");
        }

        let limit = cfg.limit_per_source.unwrap_or(usize::MAX);
        if limit < pack.entities.len() {
            tracing::info!(source = key, limit, total = pack.entities.len(), "limiting entities");
        }
        tracing::info!(source = key, entities = pack.entities.len(), "building events");
        let mut events = Vec::new();
        let mut noncompliant = Vec::new();
        for (idx, ent) in pack.entities.iter().take(limit).enumerate() {
            let date = ent.post_date.map(|d| d.to_string());
            let outcome = extract_events_from_url(
                llm,
                http,
                &ent.canonical_url,
                &system_prompt,
                Some(&ent.title),
                date.as_deref(),
                idx,
                &cfg.paths.log_dir(),
                cfg.debug_policy,
            )
            .await;

            match outcome {
                ExtractionOutcome::Reply {
                    text,
                    attempts,
                    schema_ok,
                    ..
                } => {
                    let parsed = parse_event_blocks(&text, &ent.canonical_url);
                    tracing::info!(
                        source = key,
                        idx,
                        url = %ent.canonical_url,
                        attempts,
                        schema_ok,
                        events = parsed.len(),
                        "extracted"
                    );
                    if parsed.is_empty() {
                        noncompliant.push(NoncompliantItem {
                            index: idx,
                            url: ent.canonical_url.clone(),
                            reason: if schema_ok {
                                FailureReason::NoBlocksParsed
                            } else {
                                FailureReason::SchemaNoncompliant
                            },
                        });
                    } else {
                        for mut ev in parsed {
                            if ev.tags.is_empty() {
                                ev.tags.push(key.to_string());
                            }
                            events.push(ev);
                        }
                    }
                }
                ExtractionOutcome::Failed { reason, detail } => {
                    tracing::warn!(source = key, idx, url = %ent.canonical_url, %detail, "extraction failed");
                    noncompliant.push(NoncompliantItem {
                        index: idx,
                        url: ent.canonical_url.clone(),
                        reason,
                    });
                }
            }
        }

        let envelope = EventsEnvelope::new(key, cfg.window, events, noncompliant);
        match write_json(&cfg.paths.events(key, cfg.window), &envelope) {
            Ok(()) => report.ok(
                key,
                format!(
                    "{} events, {} noncompliant",
                    envelope.count,
                    envelope.noncompliant.len()
                ),
            ),
            Err(e) => report.fail(key, format!("envelope write failed: {e}")),
        }
    }
    Ok(report)
}

/// Stage 3: merge every envelope for the window into the master log.
pub fn run_write(cfg: &PipelineConfig, opts: &MergeOptions) -> Result<StageReport, PipelineError> {
    let mut opts = opts.clone();
    if opts.only.is_empty() {
        opts.only = cfg.only.clone();
    }
    if opts.skip.is_empty() {
        opts.skip = cfg.skip.clone();
    }
    let summary = run_merge(&cfg.paths, cfg.window, &opts)?;
    let mut report = StageReport::default();
    report.ok(
        "master",
        format!(
            "{} events from {} sources ({} weekly files)",
            summary.events_written,
            summary.sources.len(),
            summary.weekly_files
        ),
    );
    Ok(report)
}

/// All three stages in order. Harvest and build failures are carried into
/// the combined report; the merge still runs over whatever succeeded.
pub async fn run_all(
    llm: &dyn CompletionClient,
    http: &HttpClient,
    cfg: &PipelineConfig,
    merge_opts: &MergeOptions,
) -> Result<StageReport, PipelineError> {
    let mut combined = run_harvest(http, cfg).await?;
    combined
        .outcomes
        .extend(run_build(llm, http, cfg).await?.outcomes);
    combined.outcomes.extend(run_write(cfg, merge_opts)?.outcomes);
    Ok(combined)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Entity;
    use crate::llm::{Token, TokenStream};
    use async_trait::async_trait;
    use futures::stream;
    use httpmock::prelude::*;
    use ollama_rs::generation::chat::ChatMessage;

    struct Canned(&'static str);

    #[async_trait]
    impl CompletionClient for Canned {
        async fn chat_stream(
            &self,
            _: &[ChatMessage],
        ) -> Result<TokenStream, Box<dyn std::error::Error + Send + Sync>> {
            let text = self.0.to_string();
            Ok(Box::pin(stream::once(async move { Token { text } })))
        }
    }

    fn window() -> Window {
        Window::resolve(
            Some("2025-01-25".parse().unwrap()),
            Some("2025-01-31".parse().unwrap()),
            None,
            None,
        )
        .unwrap()
    }

    fn cfg(root: &std::path::Path, only: &[&str]) -> PipelineConfig {
        PipelineConfig {
            paths: ArtifactPaths::new(root),
            window: window(),
            only: only.iter().map(|s| s.to_string()).collect(),
            skip: Vec::new(),
            debug_policy: DebugPolicy::Never,
            limit_per_source: None,
        }
    }

    #[test]
    fn source_selection_respects_only_and_skip() {
        let tmp = tempfile::tempdir().unwrap();
        let c = cfg(tmp.path(), &["zeteo"]);
        let (keys, unknown) = c.selected_sources();
        assert_eq!(keys, vec!["zeteo"]);
        assert!(unknown.is_empty());

        let c = cfg(tmp.path(), &["nope"]);
        let (keys, unknown) = c.selected_sources();
        assert!(keys.is_empty());
        assert_eq!(unknown, vec!["nope".to_string()]);

        let mut c = cfg(tmp.path(), &[]);
        c.skip = vec!["meidas".to_string()];
        let (keys, _) = c.selected_sources();
        assert!(!keys.contains(&"meidas"));
        assert!(keys.contains(&"zeteo"));
    }

    #[test]
    fn missing_pack_fails_only_that_source() {
        let tmp = tempfile::tempdir().unwrap();
        let c = cfg(tmp.path(), &["zeteo"]);
        let llm = Canned("");
        let http = HttpClient::new().unwrap();
        let report = tokio_test::block_on(run_build(&llm, &http, &c)).unwrap();
        assert_eq!(report.outcomes.len(), 1);
        assert!(report.any_failed());
        assert!(report.outcomes[0].detail.contains("no filtered pack"));
    }

    #[tokio::test]
    async fn build_writes_envelope_and_prompt() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/p/week12");
                then.status(200)
                    .body("<html><body><p>The order was signed.</p></body></html>");
            })
            .await;

        let tmp = tempfile::tempdir().unwrap();
        let c = cfg(tmp.path(), &["zeteo"]);
        c.paths.ensure_dirs().unwrap();

        let ent = Entity {
            source: "Zeteo".into(),
            doc_type: "news_article".into(),
            title: "This Week in Democracy #12".into(),
            url: server.url("/p/week12"),
            canonical_url: server.url("/p/week12"),
            summary_url: String::new(),
            summary: String::new(),
            post_date: Some("2025-01-28".parse().unwrap()),
            raw_line: String::new(),
        };
        let pack = FilteredPack::new("zeteo", window(), vec![ent], Default::default());
        write_json(&c.paths.filtered("zeteo", window()), &pack).unwrap();

        let reply = "2025-01-27 — Order signed\nSummary: s\nSource: https://x.example/1\nCategory: Executive Actions & Orders\nWhy Relevant: w\nattacks: [courts]\n\nTotal events found: [1]\n[END OF LOG]";
        let llm = Canned(reply);
        let http = HttpClient::new().unwrap();
        let report = run_build(&llm, &http, &c).await.unwrap();
        assert!(!report.any_failed());

        let envelope: EventsEnvelope = read_json(&c.paths.events("zeteo", window())).unwrap();
        assert_eq!(envelope.count, 1);
        assert_eq!(envelope.events[0].title, "Order signed");
        assert_eq!(envelope.events[0].attacks, vec!["courts"]);
        assert_eq!(envelope.events[0].tags, vec!["zeteo"]);
        assert!(envelope.noncompliant.is_empty());
        assert!(c.paths.prompt("zeteo", window()).exists());
    }

    fn one_entity_pack(source: &str, label: &str, url: String) -> FilteredPack {
        let ent = Entity {
            source: label.into(),
            doc_type: "news_article".into(),
            title: "Post".into(),
            url: url.clone(),
            canonical_url: url,
            summary_url: String::new(),
            summary: String::new(),
            post_date: None,
            raw_line: String::new(),
        };
        FilteredPack::new(source, window(), vec![ent], Default::default())
    }

    #[tokio::test]
    async fn footerless_reply_still_yields_its_events() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/p/a");
                then.status(200).body("<p>body</p>");
            })
            .await;

        let tmp = tempfile::tempdir().unwrap();
        let c = cfg(tmp.path(), &["hcr"]);
        c.paths.ensure_dirs().unwrap();
        let pack = one_entity_pack("hcr", "Letters from an American", server.url("/p/a"));
        write_json(&c.paths.filtered("hcr", window()), &pack).unwrap();

        // Block-valid but truncated before the footer, on both attempts.
        let reply = "2025-01-27 — Stay granted\nSummary: s\nSource: https://x.example/1\nCategory: Judicial Developments\nWhy Relevant: w\nattacks: []";
        let llm = Canned(reply);
        let http = HttpClient::new().unwrap();
        let report = run_build(&llm, &http, &c).await.unwrap();
        assert!(!report.any_failed());

        let envelope: EventsEnvelope = read_json(&c.paths.events("hcr", window())).unwrap();
        assert_eq!(envelope.count, 1, "salvaged blocks must reach the envelope");
        assert_eq!(envelope.events[0].title, "Stay granted");
        assert!(envelope.noncompliant.is_empty());
    }

    #[tokio::test]
    async fn unparseable_noncompliant_reply_gets_the_schema_reason() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/p/b");
                then.status(200).body("<p>body</p>");
            })
            .await;

        let tmp = tempfile::tempdir().unwrap();
        let c = cfg(tmp.path(), &["meidas"]);
        c.paths.ensure_dirs().unwrap();
        let pack = one_entity_pack("meidas", "MeidasTouch", server.url("/p/b"));
        write_json(&c.paths.filtered("meidas", window()), &pack).unwrap();

        let llm = Canned("no schema in this reply at all");
        let http = HttpClient::new().unwrap();
        run_build(&llm, &http, &c).await.unwrap();

        let envelope: EventsEnvelope = read_json(&c.paths.events("meidas", window())).unwrap();
        assert_eq!(envelope.count, 0);
        assert_eq!(envelope.noncompliant.len(), 1);
        assert_eq!(
            envelope.noncompliant[0].reason,
            FailureReason::SchemaNoncompliant
        );
    }

    #[tokio::test]
    async fn action_date_sources_get_the_override_in_the_persisted_prompt() {
        let tmp = tempfile::tempdir().unwrap();
        let c = cfg(tmp.path(), &["democracydocket"]);
        c.paths.ensure_dirs().unwrap();
        let pack = FilteredPack::new("democracydocket", window(), vec![], Default::default());
        write_json(&c.paths.filtered("democracydocket", window()), &pack).unwrap();

        let llm = Canned("never called");
        let http = HttpClient::new().unwrap();
        run_build(&llm, &http, &c).await.unwrap();

        let prompt =
            std::fs::read_to_string(c.paths.prompt("democracydocket", window())).unwrap();
        assert!(prompt.contains("DATING OVERRIDE:"));

        let zeteo = compose_system_prompt("zeteo", DatePolicy::PostDate);
        assert!(!zeteo.contains("DATING OVERRIDE:"));
    }

    #[tokio::test]
    async fn limit_per_source_caps_extraction() {
        let tmp = tempfile::tempdir().unwrap();
        let mut c = cfg(tmp.path(), &["meidas"]);
        c.limit_per_source = Some(0);
        c.paths.ensure_dirs().unwrap();

        let ent = Entity {
            source: "MeidasTouch".into(),
            doc_type: "news_article".into(),
            title: "Bulletin".into(),
            url: "https://m.example/b".into(),
            canonical_url: "https://m.example/b".into(),
            summary_url: String::new(),
            summary: String::new(),
            post_date: None,
            raw_line: String::new(),
        };
        let pack = FilteredPack::new("meidas", window(), vec![ent], Default::default());
        write_json(&c.paths.filtered("meidas", window()), &pack).unwrap();

        let llm = Canned("never called");
        let http = HttpClient::new().unwrap();
        let report = run_build(&llm, &http, &c).await.unwrap();
        assert!(!report.any_failed());

        let envelope: EventsEnvelope = read_json(&c.paths.events("meidas", window())).unwrap();
        assert_eq!(envelope.count, 0);
        assert!(envelope.noncompliant.is_empty());
    }

    #[tokio::test]
    async fn fetch_failure_lands_in_noncompliant() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/gone");
                then.status(404);
            })
            .await;

        let tmp = tempfile::tempdir().unwrap();
        let c = cfg(tmp.path(), &["hcr"]);
        c.paths.ensure_dirs().unwrap();

        let ent = Entity {
            source: "Letters from an American".into(),
            doc_type: "news_article".into(),
            title: "Letter".into(),
            url: server.url("/gone"),
            canonical_url: server.url("/gone"),
            summary_url: String::new(),
            summary: String::new(),
            post_date: None,
            raw_line: String::new(),
        };
        let pack = FilteredPack::new("hcr", window(), vec![ent], Default::default());
        write_json(&c.paths.filtered("hcr", window()), &pack).unwrap();

        let llm = Canned("never called");
        let http = HttpClient::new().unwrap();
        let report = run_build(&llm, &http, &c).await.unwrap();
        assert!(!report.any_failed(), "a failed item is data, not a stage failure");

        let envelope: EventsEnvelope = read_json(&c.paths.events("hcr", window())).unwrap();
        assert_eq!(envelope.count, 0);
        assert_eq!(envelope.noncompliant.len(), 1);
        assert_eq!(envelope.noncompliant[0].reason, FailureReason::FetchFailed);
    }
}
