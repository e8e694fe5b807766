use std::sync::LazyLock;
use std::time::Duration;

use regex::{Captures, Regex};

use super::{PageFetcher, WebError};
use crate::config::{APP_NAME, APP_VERSION};

static NON_CONTENT_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<!--.*?-->|<(script|style|noscript)\b[^>]*>.*?</(?:script|style|noscript)\s*>")
        .expect("valid regex")
});

static TEXT_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<(p|h[1-6])\b[^>]*>(.*?)</(?:p|h[1-6])\s*>").expect("valid regex")
});

static ANY_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").expect("valid regex"));

static NUMERIC_ENTITY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&#([xX][0-9a-fA-F]+|[0-9]+);").expect("valid regex"));

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Fetches pages over HTTP and keeps paragraph and heading text.
pub struct HttpPageFetcher {
    client: reqwest::blocking::Client,
}

impl HttpPageFetcher {
    pub fn new(timeout: Duration) -> Result<Self, WebError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(format!("Mozilla/5.0 (compatible; {APP_NAME}/{APP_VERSION})"))
            .build()
            .map_err(|e| WebError::Search(e.to_string()))?;
        Ok(Self { client })
    }
}

impl PageFetcher for HttpPageFetcher {
    fn fetch_text(&self, url: &str) -> Result<String, WebError> {
        let fetch_failed = |reason: String, transient: bool| WebError::PageFetchFailed {
            url: url.to_string(),
            reason,
            transient,
        };

        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| fetch_failed(e.to_string(), e.is_connect() || e.is_timeout()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(fetch_failed(
                format!("HTTP {}", status.as_u16()),
                status.as_u16() == 429 || status.is_server_error(),
            ));
        }

        let is_text = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|ct| ct.contains("html") || ct.starts_with("text/"))
            .unwrap_or(true);
        if !is_text {
            tracing::debug!(url, "Skipping non-text content");
            return Ok(String::new());
        }

        let body = response
            .text()
            .map_err(|e| fetch_failed(e.to_string(), e.is_timeout()))?;
        Ok(extract_readable_text(&body))
    }
}

/// Paragraph and heading text of an HTML document, one block per
/// paragraph separated by blank lines. Scripts, styles and comments are
/// dropped; empty blocks are skipped.
pub fn extract_readable_text(html: &str) -> String {
    let cleaned = NON_CONTENT_BLOCK.replace_all(html, " ");

    TEXT_BLOCK
        .captures_iter(&cleaned)
        .filter_map(|caps| {
            let inner = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
            let stripped = ANY_TAG.replace_all(inner, " ");
            let decoded = decode_entities(&stripped);
            let text = WHITESPACE.replace_all(&decoded, " ").trim().to_string();
            (!text.is_empty()).then_some(text)
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn decode_entities(text: &str) -> String {
    let numeric = NUMERIC_ENTITY.replace_all(text, |caps: &Captures| {
        let raw = &caps[1];
        let code = match raw.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok(),
            None => raw.parse::<u32>().ok(),
        };
        code.and_then(char::from_u32)
            .map(String::from)
            .unwrap_or_else(|| caps[0].to_string())
    });

    // &amp; last so "&amp;lt;" stays "&lt;"
    numeric
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
