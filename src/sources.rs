use async_trait::async_trait;
use serde_json::Value;

use crate::entity::{RawItem, coerce_date};
use crate::error::PipelineError;
use crate::http::{HttpClient, polite_sleep};
use crate::window::Window;

/// Which date the extraction prompt should prefer for events from a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatePolicy {
    /// Events default to the item's publication date.
    PostDate,
    /// The source text names the act's own date; prefer it when present.
    PreferActionDate,
}

/// Static description of one source: identity, archive endpoint, and the
/// knobs discovery and prompting need. Adding a source is adding a row.
#[derive(Debug, Clone, Copy)]
pub struct SourceSpec {
    pub key: &'static str,
    /// Human label used as the entity `source` field.
    pub label: &'static str,
    pub archive_url: &'static str,
    /// Lowercase substring an item title must contain, if any.
    pub title_filter: Option<&'static str>,
    pub date_policy: DatePolicy,
}

const SPECS: &[SourceSpec] = &[
    SourceSpec {
        key: "zeteo",
        label: "Zeteo",
        archive_url: "https://zeteo.com/api/v1/archive",
        title_filter: Some("this week in democracy"),
        date_policy: DatePolicy::PostDate,
    },
    SourceSpec {
        key: "meidas",
        label: "MeidasTouch",
        archive_url: "https://www.meidastouch.com/api/v1/archive",
        title_filter: None,
        date_policy: DatePolicy::PostDate,
    },
    SourceSpec {
        key: "hcr",
        label: "Letters from an American",
        archive_url: "https://heathercoxrichardson.substack.com/api/v1/archive",
        title_filter: None,
        date_policy: DatePolicy::PostDate,
    },
    SourceSpec {
        key: "democracydocket",
        label: "Democracy Docket",
        archive_url: "https://www.democracydocket.com/api/v1/archive",
        title_filter: None,
        date_policy: DatePolicy::PreferActionDate,
    },
];

pub fn registry() -> &'static [SourceSpec] {
    SPECS
}

pub fn spec_for(key: &str) -> Option<&'static SourceSpec> {
    SPECS.iter().find(|s| s.key == key)
}

/// What discovery produced for one source and window.
#[derive(Debug, Default)]
pub struct Harvest {
    /// Items that passed the in-window and title checks, discovery order.
    pub matches: Vec<RawItem>,
    /// Everything the archive returned, for the raw snapshot artifact.
    pub snapshot: Vec<RawItem>,
    pub archive_url: String,
}

/// A source that can discover candidate items for a window.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    fn spec(&self) -> &SourceSpec;

    async fn discover(&self, http: &HttpClient, window: Window) -> Result<Harvest, PipelineError>;
}

fn field_str<'a>(post: &'a Value, keys: &[&str]) -> &'a str {
    for k in keys {
        if let Some(s) = post.get(*k).and_then(Value::as_str) {
            let s = s.trim();
            if !s.is_empty() {
                return s;
            }
        }
    }
    ""
}

fn posts_from_payload(payload: &Value) -> &[Value] {
    if let Some(list) = payload.as_array() {
        return list;
    }
    if let Some(list) = payload.get("items").and_then(Value::as_array) {
        return list;
    }
    &[]
}

fn to_raw_item(post: &Value, key: &str) -> RawItem {
    let title = field_str(post, &["title", "social_title"]);
    let url = field_str(post, &["canonical_url", "url"]);
    let date = field_str(post, &["post_date", "published_at", "created_at", "date"]);
    let date_short: String = date.chars().take(10).collect();
    RawItem {
        title: title.to_string(),
        url: url.to_string(),
        date: date.to_string(),
        doc_type: "news_article".to_string(),
        summary: field_str(post, &["description", "subtitle"]).to_string(),
        summary_url: String::new(),
        raw_line: format!("[{key}] {title} ({date_short})"),
    }
}

/// Generic Substack-style archive adapter: page newest-to-older with
/// `sort=new&offset=N&limit=per`, stop early once a page is entirely older
/// than the window start with no in-window hits.
pub struct SubstackArchiveAdapter {
    spec: SourceSpec,
    pages_cap: usize,
    per_page: usize,
}

impl SubstackArchiveAdapter {
    pub fn new(spec: SourceSpec) -> Self {
        Self {
            spec,
            pages_cap: 2_000,
            per_page: 50,
        }
    }

    #[cfg(test)]
    fn with_archive_url(mut self, url: &'static str) -> Self {
        self.spec.archive_url = url;
        self
    }
}

#[async_trait]
impl SourceAdapter for SubstackArchiveAdapter {
    fn spec(&self) -> &SourceSpec {
        &self.spec
    }

    async fn discover(&self, http: &HttpClient, window: Window) -> Result<Harvest, PipelineError> {
        let mut harvest = Harvest {
            archive_url: self.spec.archive_url.to_string(),
            ..Harvest::default()
        };
        let mut seen_ids: std::collections::HashSet<String> = std::collections::HashSet::new();
        let per = self.per_page.clamp(1, 50);

        tracing::info!(
            source = self.spec.key,
            window = %window,
            archive = self.spec.archive_url,
            "starting archive discovery"
        );

        for page_idx in 0..self.pages_cap {
            let offset = page_idx * per;
            let url = format!(
                "{}?sort=new&offset={offset}&limit={per}",
                self.spec.archive_url
            );
            let (status, payload) = http.get_json(&url).await;
            if status != 200 {
                tracing::warn!(source = self.spec.key, page = page_idx + 1, status, "non-200 from archive; stopping");
                break;
            }
            let payload = match payload {
                Some(p) => p,
                None => {
                    tracing::warn!(source = self.spec.key, page = page_idx + 1, "unparseable archive page; stopping");
                    break;
                }
            };
            let posts = posts_from_payload(&payload);
            if posts.is_empty() {
                tracing::info!(source = self.spec.key, page = page_idx + 1, "empty page; stopping");
                break;
            }

            let mut older_seen = false;
            let mut in_range_found = false;
            let mut kept_on_page = 0usize;

            for post in posts {
                let item = to_raw_item(post, self.spec.key);
                let pid = if item.url.is_empty() {
                    format!("{}|{}", item.date, item.title)
                } else {
                    item.url.clone()
                };
                if !seen_ids.insert(pid) {
                    continue;
                }

                let date = coerce_date(&item.date);
                harvest.snapshot.push(item.clone());

                let date = match date {
                    Some(d) => d,
                    None => {
                        tracing::debug!(source = self.spec.key, title = %item.title, "skip: no date");
                        continue;
                    }
                };
                if date < window.start {
                    older_seen = true;
                }
                if !window.contains(date) {
                    continue;
                }
                in_range_found = true;

                if let Some(filter) = self.spec.title_filter {
                    if !item.title.to_lowercase().contains(filter) {
                        tracing::debug!(source = self.spec.key, title = %item.title, "skip: title filter");
                        continue;
                    }
                }
                kept_on_page += 1;
                harvest.matches.push(item);
            }

            tracing::info!(
                source = self.spec.key,
                page = page_idx + 1,
                posts = posts.len(),
                kept = kept_on_page,
                in_window = in_range_found,
                saw_older = older_seen,
                "page decisions"
            );

            if older_seen && !in_range_found {
                tracing::info!(source = self.spec.key, page = page_idx + 1, "early stop");
                break;
            }
            polite_sleep().await;
        }

        tracing::info!(
            source = self.spec.key,
            seen = harvest.snapshot.len(),
            kept = harvest.matches.len(),
            "archive discovery complete"
        );
        Ok(harvest)
    }
}

/// Construct the adapter for a registered source key.
pub fn adapter_for(key: &str) -> Option<Box<dyn SourceAdapter>> {
    spec_for(key).map(|spec| Box::new(SubstackArchiveAdapter::new(*spec)) as Box<dyn SourceAdapter>)
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn window() -> Window {
        Window::resolve(
            Some("2025-01-25".parse().unwrap()),
            Some("2025-01-31".parse().unwrap()),
            None,
            None,
        )
        .unwrap()
    }

    fn leaked_url(server: &MockServer) -> &'static str {
        Box::leak(server.url("/api/v1/archive").into_boxed_str())
    }

    #[test]
    fn registry_keys_are_unique() {
        let mut keys: Vec<_> = registry().iter().map(|s| s.key).collect();
        keys.sort();
        keys.dedup();
        assert_eq!(keys.len(), registry().len());
        assert!(spec_for("zeteo").is_some());
        assert!(spec_for("nope").is_none());
    }

    #[tokio::test]
    async fn discovery_filters_titles_and_maps_fields() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/v1/archive").query_param("offset", "0");
                then.status(200).json_body(json!([
                    {"title": "This Week in Democracy #12", "canonical_url": "https://z.example/p12",
                     "post_date": "2025-01-28T10:00:00Z"},
                    {"title": "Unrelated essay", "canonical_url": "https://z.example/essay",
                     "post_date": "2025-01-27T10:00:00Z"},
                    {"title": "This Week in Democracy #11", "canonical_url": "https://z.example/p11",
                     "post_date": "2025-01-10T10:00:00Z"}
                ]));
            })
            .await;

        let spec = *spec_for("zeteo").unwrap();
        let adapter = SubstackArchiveAdapter::new(spec).with_archive_url(leaked_url(&server));
        let http = HttpClient::new().unwrap();
        let harvest = adapter.discover(&http, window()).await.unwrap();

        // One in-window TWID match; the old post triggered the early stop.
        assert_eq!(harvest.matches.len(), 1);
        assert_eq!(harvest.matches[0].url, "https://z.example/p12");
        assert_eq!(harvest.matches[0].title, "This Week in Democracy #12");
        assert_eq!(harvest.snapshot.len(), 3);
    }

    #[tokio::test]
    async fn early_stop_on_all_older_page() {
        let server = MockServer::start_async().await;
        let page0 = server
            .mock_async(|when, then| {
                when.method(GET).path("/api/v1/archive").query_param("offset", "0");
                then.status(200).json_body(json!([
                    {"title": "old one", "url": "https://m.example/a", "post_date": "2025-01-02"},
                    {"title": "old two", "url": "https://m.example/b", "post_date": "2025-01-03"}
                ]));
            })
            .await;
        let page1 = server
            .mock_async(|when, then| {
                when.method(GET).path("/api/v1/archive").query_param("offset", "50");
                then.status(200).json_body(json!([]));
            })
            .await;

        let spec = *spec_for("meidas").unwrap();
        let adapter = SubstackArchiveAdapter::new(spec).with_archive_url(leaked_url(&server));
        let http = HttpClient::new().unwrap();
        let harvest = adapter.discover(&http, window()).await.unwrap();

        assert!(harvest.matches.is_empty());
        assert_eq!(page0.hits_async().await, 1);
        assert_eq!(page1.hits_async().await, 0, "must stop before page 2");
    }

    #[tokio::test]
    async fn wrapped_items_payload_is_accepted() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/v1/archive").query_param("offset", "0");
                then.status(200).json_body(json!({"items": [
                    {"title": "Letter of Jan 26", "url": "https://h.example/jan26",
                     "published_at": "2025-01-26"}
                ]}));
            })
            .await;
        let page1 = server
            .mock_async(|when, then| {
                when.method(GET).path("/api/v1/archive").query_param("offset", "50");
                then.status(200).json_body(json!([]));
            })
            .await;

        let spec = *spec_for("hcr").unwrap();
        let adapter = SubstackArchiveAdapter::new(spec).with_archive_url(leaked_url(&server));
        let http = HttpClient::new().unwrap();
        let harvest = adapter.discover(&http, window()).await.unwrap();
        assert_eq!(harvest.matches.len(), 1);
        assert_eq!(harvest.matches[0].date, "2025-01-26");
        assert_eq!(page1.hits_async().await, 1);
    }
}
