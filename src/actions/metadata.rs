use regex::Regex;
use reqwest::{StatusCode, Url};
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

static TITLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<title>(.*?)</title>").expect("valid title regex"));

static DESCRIPTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<meta\s+name=["']description["']\s+content=["'](.*?)["']"#)
        .expect("valid description regex")
});

// One-hour cache hint.
const CACHE_HINT: &str = "max-age=3600";

#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    #[error("invalid url {url:?}: {source}")]
    InvalidUrl {
        url: String,
        source: url::ParseError,
    },
    #[error("failed to fetch {url}: {source}")]
    Request {
        url: String,
        source: reqwest::Error,
    },
    #[error("fetching {url} returned {status}")]
    Status { url: String, status: StatusCode },
}

/// Title and description of a page. A missing tag is an empty string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMetadata {
    pub title: String,
    pub description: String,
}

impl PageMetadata {
    /// First `<title>` and first description `<meta>` tag win. This is pattern
    /// matching, not an HTML parse.
    pub fn extract(html: &str) -> Self {
        let capture = |re: &Regex| {
            re.captures(html)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().to_string())
                .unwrap_or_default()
        };

        Self {
            title: capture(&TITLE_RE),
            description: capture(&DESCRIPTION_RE),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MetadataFetcher {
    client: reqwest::Client,
}

impl MetadataFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails on a non-2xx status as well as on an unreachable page.
    pub async fn fetch(&self, url: &str) -> Result<PageMetadata, MetadataError> {
        let (status, metadata) = self.fetch_page(url).await?;
        if !status.is_success() {
            return Err(MetadataError::Status {
                url: url.to_string(),
                status,
            });
        }
        Ok(metadata)
    }

    /// Extracts from whatever body the server sent, error pages included.
    /// Only an invalid URL or a failed request gives `None`, and is logged.
    pub async fn fetch_lenient(&self, url: &str) -> Option<PageMetadata> {
        match self.fetch_page(url).await {
            Ok((_, metadata)) => Some(metadata),
            Err(e) => {
                tracing::error!(error = %e, "Error fetching metadata");
                None
            }
        }
    }

    async fn fetch_page(&self, url: &str) -> Result<(StatusCode, PageMetadata), MetadataError> {
        let parsed = Url::parse(url).map_err(|source| MetadataError::InvalidUrl {
            url: url.to_string(),
            source,
        })?;
        let request_err = |source| MetadataError::Request {
            url: url.to_string(),
            source,
        };

        let response = self
            .client
            .get(parsed)
            .header(reqwest::header::CACHE_CONTROL, CACHE_HINT)
            .send()
            .await
            .map_err(request_err)?;

        let status = response.status();
        let html = response.text().await.map_err(request_err)?;
        Ok((status, PageMetadata::extract(&html)))
    }
}
