use std::time::Duration;

use once_cell::sync::Lazy;
use rand::Rng;
use regex::Regex;

use crate::error::PipelineError;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

const RETRY_TOTAL: u32 = 3;
const BACKOFF_FACTOR_MS: u64 = 500;
const BACKOFF_CAP_MS: u64 = 8_000;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

fn retryable(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

/// Browser-identified HTTP client with capped exponential backoff on
/// throttle/server statuses. Transport errors report status 0, like a
/// connection that never produced a response.
#[derive(Clone)]
pub struct HttpClient {
    client: reqwest::Client,
}

impl HttpClient {
    pub fn new() -> Result<Self, PipelineError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self { client })
    }

    /// GET a URL and return `(status, body)`. Retries up to [`RETRY_TOTAL`]
    /// times on 429/5xx with exponential backoff; other statuses return
    /// immediately with no body.
    pub async fn get_text(&self, url: &str) -> (u16, Option<String>) {
        let mut attempt = 0u32;
        loop {
            match self.client.get(url).send().await {
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    if status == 200 {
                        let body = resp.text().await.unwrap_or_default();
                        tracing::debug!(url, status, bytes = body.len(), "GET ok");
                        return (status, Some(body));
                    }
                    if !retryable(status) || attempt >= RETRY_TOTAL {
                        tracing::debug!(url, status, attempt, "GET gave up");
                        return (status, None);
                    }
                    tracing::debug!(url, status, attempt, "GET retrying");
                }
                Err(e) => {
                    if attempt >= RETRY_TOTAL {
                        tracing::debug!(url, error = %e, "GET failed");
                        return (0, None);
                    }
                    tracing::debug!(url, error = %e, attempt, "GET error, retrying");
                }
            }
            attempt += 1;
            let backoff = (BACKOFF_FACTOR_MS * (1 << (attempt - 1).min(10))).min(BACKOFF_CAP_MS);
            tokio::time::sleep(Duration::from_millis(backoff)).await;
        }
    }

    /// GET a URL and parse the body as JSON. Non-200 or unparseable bodies
    /// yield `None` alongside the status.
    pub async fn get_json(&self, url: &str) -> (u16, Option<serde_json::Value>) {
        let (status, body) = self.get_text(url).await;
        let json = body.and_then(|b| serde_json::from_str(&b).ok());
        (status, json)
    }
}

static SCRIPT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<(script|style|noscript)\b.*?</(script|style|noscript)>").expect("valid regex"));
static COMMENT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<!--.*?-->").expect("valid regex"));
static BLOCK_END_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<(?:br\s*/?|/p|/div|/li|/h[1-6]|/tr|/section|/article)>").expect("valid regex"));
static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]+>").expect("valid regex"));
static BLANKS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").expect("valid regex"));

/// Reduce an HTML document to readable plain text: drop script/style and
/// comments, turn block boundaries into newlines, strip the remaining tags,
/// and decode entities.
pub fn html_to_text(html: &str) -> String {
    let no_script = SCRIPT_RE.replace_all(html, " ");
    let no_comment = COMMENT_RE.replace_all(&no_script, " ");
    let with_breaks = BLOCK_END_RE.replace_all(&no_comment, "\n");
    let no_tags = TAG_RE.replace_all(&with_breaks, " ");
    let decoded = html_escape::decode_html_entities(no_tags.as_ref());

    let mut lines: Vec<String> = Vec::new();
    for raw_line in decoded.lines() {
        let line = raw_line.split_whitespace().collect::<Vec<_>>().join(" ");
        lines.push(line);
    }
    let joined = lines.join("\n");
    BLANKS_RE.replace_all(joined.trim(), "\n\n").into_owned()
}

/// Fetch an article page and reduce it to plain text for extraction.
/// Returns `("", status)` when the fetch failed or the body was empty.
pub async fn fetch_article_text(client: &HttpClient, url: &str) -> (String, u16) {
    let (status, body) = client.get_text(url).await;
    let text = match body {
        Some(html) => html_to_text(&html),
        None => String::new(),
    };
    tracing::debug!(url, status, chars = text.len(), "fetched article text");
    (text, status)
}

/// Small human-ish pause between requests to the same host.
pub async fn polite_sleep() {
    let ms = {
        let mut rng = rand::thread_rng();
        400 + rng.gen_range(0..550)
    };
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    #[tokio::test]
    async fn returns_body_on_200() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/page");
                then.status(200).body("hello");
            })
            .await;
        let client = HttpClient::new().unwrap();
        let (status, body) = client.get_text(&server.url("/page")).await;
        assert_eq!(status, 200);
        assert_eq!(body.as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn does_not_retry_hard_client_errors() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/gone");
                then.status(404);
            })
            .await;
        let client = HttpClient::new().unwrap();
        let (status, body) = client.get_text(&server.url("/gone")).await;
        assert_eq!(status, 404);
        assert!(body.is_none());
        assert_eq!(mock.hits_async().await, 1);
    }

    #[tokio::test]
    async fn retries_throttle_statuses() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/busy");
                then.status(503);
            })
            .await;
        let client = HttpClient::new().unwrap();
        let (status, body) = client.get_text(&server.url("/busy")).await;
        assert_eq!(status, 503);
        assert!(body.is_none());
        assert_eq!(mock.hits_async().await, (RETRY_TOTAL + 1) as usize);
    }

    #[test]
    fn strips_tags_and_decodes_entities() {
        let html = "<html><head><style>p{color:red}</style></head>\
                    <body><p>Tom &amp; Jerry</p><script>var x=1;</script>\
                    <div>next block</div></body></html>";
        let text = html_to_text(html);
        assert!(text.contains("Tom & Jerry"));
        assert!(text.contains("next block"));
        assert!(!text.contains("color:red"));
        assert!(!text.contains("var x"));
        assert!(!text.contains('<'));
    }

    #[test]
    fn block_boundaries_become_newlines() {
        let text = html_to_text("<p>one</p><p>two</p>");
        let lines: Vec<_> = text.lines().filter(|l| !l.is_empty()).collect();
        assert_eq!(lines, vec!["one", "two"]);
    }
}
