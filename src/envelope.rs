use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::entity::{Entity, RawItem, WindowStats};
use crate::error::PipelineError;
use crate::parser::EventRecord;
use crate::window::Window;

/// Artifact layout under one root:
///
/// ```text
/// artifacts/json/      {source}_raw_{start}_{end}.json
///                      {source}_filtered_{start}_{end}.json
/// artifacts/eventjson/ {source}_events_{start}_{end}.json
///                      master_index_{start}_{end}.json
///                      master_index_week{NN}_{start}_{end}.json
/// artifacts/events/    master_events_{start}_{end}.txt
/// artifacts/log/       per-item debug artifacts, composed prompts
/// ```
#[derive(Debug, Clone)]
pub struct ArtifactPaths {
    root: PathBuf,
}

impl ArtifactPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn log_dir(&self) -> PathBuf {
        self.root.join("log")
    }

    pub fn ensure_dirs(&self) -> Result<(), PipelineError> {
        for sub in ["json", "eventjson", "events", "log"] {
            std::fs::create_dir_all(self.root.join(sub))?;
        }
        Ok(())
    }

    pub fn raw(&self, source: &str, window: Window) -> PathBuf {
        self.root
            .join("json")
            .join(format!("{source}_raw_{}_{}.json", window.start, window.end))
    }

    pub fn filtered(&self, source: &str, window: Window) -> PathBuf {
        self.root
            .join("json")
            .join(format!("{source}_filtered_{}_{}.json", window.start, window.end))
    }

    pub fn events(&self, source: &str, window: Window) -> PathBuf {
        self.root
            .join("eventjson")
            .join(format!("{source}_events_{}_{}.json", window.start, window.end))
    }

    pub fn master_txt(&self, window: Window) -> PathBuf {
        self.root
            .join("events")
            .join(format!("master_events_{}_{}.txt", window.start, window.end))
    }

    pub fn master_index(&self, window: Window) -> PathBuf {
        self.root
            .join("eventjson")
            .join(format!("master_index_{}_{}.json", window.start, window.end))
    }

    pub fn weekly_index(&self, week_number: u32, week: Window) -> PathBuf {
        self.root.join("eventjson").join(format!(
            "master_index_week{week_number:02}_{}_{}.json",
            week.start, week.end
        ))
    }

    pub fn prompt(&self, source: &str, window: Window) -> PathBuf {
        self.root
            .join("log")
            .join(format!("{source}_prompt_{}_{}.txt", window.start, window.end))
    }
}

/// Pre-window snapshot of everything a source adapter saw; kept for audit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawSnapshot {
    pub source: String,
    pub window: Window,
    #[serde(default)]
    pub archive_url: String,
    pub parsed_total: usize,
    pub items_snapshot: Vec<RawItem>,
}

/// Windowed, deduplicated entities plus the filter accounting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilteredPack {
    pub generated_at: String,
    pub source: String,
    pub window: Window,
    pub count: usize,
    pub entities: Vec<Entity>,
    pub window_stats: WindowStats,
}

impl FilteredPack {
    pub fn new(source: &str, window: Window, entities: Vec<Entity>, stats: WindowStats) -> Self {
        Self {
            generated_at: Utc::now().to_rfc3339(),
            source: source.to_string(),
            window,
            count: entities.len(),
            entities,
            window_stats: stats,
        }
    }
}

/// One entity that produced no events, with the typed reason.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoncompliantItem {
    pub index: usize,
    #[serde(default)]
    pub url: String,
    pub reason: crate::error::FailureReason,
}

/// Per-source extraction output, ready for the master merge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventsEnvelope {
    pub source: String,
    pub window: Window,
    pub count: usize,
    pub events: Vec<EventRecord>,
    pub noncompliant: Vec<NoncompliantItem>,
}

impl EventsEnvelope {
    pub fn new(
        source: &str,
        window: Window,
        events: Vec<EventRecord>,
        noncompliant: Vec<NoncompliantItem>,
    ) -> Self {
        Self {
            source: source.to_string(),
            window,
            count: events.len(),
            events,
            noncompliant,
        }
    }
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), PipelineError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let body = serde_json::to_string_pretty(value)?;
    std::fs::write(path, body)?;
    Ok(())
}

pub fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T, PipelineError> {
    if !path.exists() {
        return Err(PipelineError::MissingInput(path.display().to_string()));
    }
    let body = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&body)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureReason;

    fn window() -> Window {
        Window::resolve(
            Some("2025-01-25".parse().unwrap()),
            Some("2025-01-31".parse().unwrap()),
            None,
            None,
        )
        .unwrap()
    }

    #[test]
    fn path_scheme_matches_the_artifact_layout() {
        let paths = ArtifactPaths::new("/tmp/artifacts");
        let w = window();
        assert!(paths
            .raw("zeteo", w)
            .ends_with("json/zeteo_raw_2025-01-25_2025-01-31.json"));
        assert!(paths
            .filtered("zeteo", w)
            .ends_with("json/zeteo_filtered_2025-01-25_2025-01-31.json"));
        assert!(paths
            .events("zeteo", w)
            .ends_with("eventjson/zeteo_events_2025-01-25_2025-01-31.json"));
        assert!(paths
            .master_txt(w)
            .ends_with("events/master_events_2025-01-25_2025-01-31.txt"));
        assert!(paths
            .master_index(w)
            .ends_with("eventjson/master_index_2025-01-25_2025-01-31.json"));
        assert!(paths
            .weekly_index(2, w)
            .ends_with("eventjson/master_index_week02_2025-01-25_2025-01-31.json"));
    }

    #[test]
    fn envelope_round_trips_through_json() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("eventjson/x_events.json");
        let env = EventsEnvelope::new(
            "x",
            window(),
            vec![],
            vec![NoncompliantItem {
                index: 3,
                url: "https://a.example/p".into(),
                reason: FailureReason::FetchFailed,
            }],
        );
        write_json(&path, &env).unwrap();
        let back: EventsEnvelope = read_json(&path).unwrap();
        assert_eq!(back.source, "x");
        assert_eq!(back.noncompliant.len(), 1);
        assert_eq!(back.noncompliant[0].reason, FailureReason::FetchFailed);
    }

    #[test]
    fn missing_input_is_a_typed_error() {
        let err = read_json::<EventsEnvelope>(Path::new("/nonexistent/nope.json"));
        assert!(matches!(err, Err(PipelineError::MissingInput(_))));
    }

    #[test]
    fn reason_codes_serialize_snake_case() {
        let s = serde_json::to_string(&FailureReason::SchemaNoncompliant).unwrap();
        assert_eq!(s, "\"schema_noncompliant\"");
    }
}
