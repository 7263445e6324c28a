//! Page image download with bounded retries and concurrent fan-out.
//!
//! [`PageFetcher::fetch_page`] downloads a single image URL to a local file,
//! retrying with exponential backoff on transport errors, bad statuses,
//! non-image content types and bodies that fail image decoding. On
//! exhaustion the last failing response body is preserved next to the
//! destination as `error_<name>.html` for offline diagnosis.
//!
//! [`PageFetcher::fetch_all`] fans out one download task per page URL under
//! a bounded semaphore and waits for all of them; one page's exhausted
//! failure never cancels its siblings. Page order is encoded purely in the
//! deterministic `<index>.webp` destination names.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use futures::future::join_all;
use log::{error, warn};
use reqwest::StatusCode;
use reqwest::header::{self, HeaderMap, HeaderValue};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Semaphore;
use tokio::task::spawn_blocking;
use tokio::time::sleep;
use url::Url;

use crate::error::{Error, Result};
use crate::normalizer::open_image;
use crate::types::PAGE_EXTENSION;

/// Browser user agent advertised on every image request.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_6) \
     AppleWebKit/605.1.15 (KHTML, like Gecko) Version/13.1.2 Safari/605.1.15";
/// Referer advertised on every image request.
pub const DEFAULT_REFERER: &str = "https://manganelo.com/";

/// Tunables for page downloads.
#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub user_agent: String,
    pub referer: String,
    /// Total attempt budget per page, including the first attempt.
    pub retry_attempts: u32,
    /// Base wait unit; attempt k (1-based retries) waits `base * 2^(k-1)`.
    pub backoff_base: Duration,
    /// Per-attempt transport timeout.
    pub request_timeout: Duration,
    /// Upper bound on concurrently running page downloads.
    pub concurrency: usize,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            referer: DEFAULT_REFERER.to_string(),
            retry_attempts: 5,
            backoff_base: Duration::from_secs(1),
            request_timeout: Duration::from_secs(30),
            concurrency: num_cpus::get().min(8),
        }
    }
}

/// One failed download attempt. Only the final attempt's failure surfaces
/// to the caller; earlier ones are logged and retried.
enum AttemptFailure {
    Transport(reqwest::Error),
    Status(StatusCode, Vec<u8>),
    ContentType(Option<String>, Vec<u8>),
    InvalidImage(image::ImageError),
    Io(std::io::Error),
    Join(tokio::task::JoinError),
    Headers(String),
}

impl fmt::Display for AttemptFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptFailure::Transport(e) => write!(f, "transport error: {}", e),
            AttemptFailure::Status(status, _) => write!(f, "HTTP error: {}", status),
            AttemptFailure::ContentType(ct, _) => {
                write!(f, "invalid content type: {:?}", ct.as_deref().unwrap_or("none"))
            }
            AttemptFailure::InvalidImage(e) => write!(f, "image validation failed: {}", e),
            AttemptFailure::Io(e) => write!(f, "file error: {}", e),
            AttemptFailure::Join(e) => write!(f, "validation task failed: {}", e),
            AttemptFailure::Headers(e) => write!(f, "{}", e),
        }
    }
}

/// Downloads chapter page images.
#[derive(Debug, Clone)]
pub struct PageFetcher {
    client: reqwest::Client,
    settings: FetchSettings,
}

impl PageFetcher {
    /// Creates a fetcher with its own HTTP client configured from `settings`.
    pub fn new(settings: FetchSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(settings.request_timeout)
            .build()?;
        Ok(Self { client, settings })
    }

    /// Downloads one image URL to `dest`, retrying up to the configured
    /// attempt budget.
    ///
    /// Any URL is attempted as given; no host validation is performed. On
    /// success `dest` holds a decodable image. On exhaustion `dest` is
    /// absent, the last response body (if any) is saved as
    /// `error_<dest_name>.html` in the same directory, and
    /// [`Error::FetchExhausted`] is returned.
    pub async fn fetch_page(&self, dest: &Path, url: &str) -> Result<()> {
        let attempts = self.settings.retry_attempts.max(1);
        let mut last_body: Option<Vec<u8>> = None;

        for attempt in 0..attempts {
            if attempt > 0 {
                sleep(self.settings.backoff_base * 2u32.pow(attempt - 1)).await;
            }

            match self.fetch_attempt(dest, url).await {
                Ok(()) => return Ok(()),
                Err(failure) => {
                    warn!(
                        "attempt {}/{} for {} failed: {}",
                        attempt + 1,
                        attempts,
                        url,
                        failure
                    );
                    let is_last = attempt + 1 == attempts;
                    match failure {
                        AttemptFailure::Status(_, body) | AttemptFailure::ContentType(_, body) => {
                            last_body = Some(body);
                        }
                        // The invalid body already sits in `dest`; keep it
                        // for the diagnostic before the file is removed.
                        AttemptFailure::InvalidImage(_) if is_last => {
                            last_body = fs::read(dest).await.ok();
                        }
                        _ => {}
                    }
                    let _ = fs::remove_file(dest).await;
                }
            }
        }

        if let Some(body) = last_body {
            let diagnostic = diagnostic_path(dest);
            match fs::write(&diagnostic, &body).await {
                Ok(()) => warn!("saved error response to {:?}", diagnostic),
                Err(e) => warn!("could not save error response for {}: {}", url, e),
            }
        }

        Err(Error::FetchExhausted {
            url: url.to_string(),
            attempts,
        })
    }

    /// Downloads every page of a chapter concurrently into `workdir`.
    ///
    /// The i-th URL (0-based) is saved as `<i + 1>.webp`. Returns per-page
    /// success flags in input order once every task has finished, whatever
    /// order they completed in.
    pub async fn fetch_all(&self, urls: &[String], workdir: &Path) -> Vec<bool> {
        let semaphore = Arc::new(Semaphore::new(self.settings.concurrency.max(1)));
        let mut tasks = Vec::with_capacity(urls.len());

        for (index, url) in urls.iter().enumerate() {
            let dest = workdir.join(format!("{}.{}", index + 1, PAGE_EXTENSION));
            let url = url.clone();
            let fetcher = self.clone();
            let semaphore = Arc::clone(&semaphore);

            tasks.push(tokio::spawn(async move {
                let _permit = semaphore.acquire().await?;
                fetcher.fetch_page(&dest, &url).await
            }));
        }

        join_all(tasks)
            .await
            .into_iter()
            .enumerate()
            .map(|(index, joined)| match joined {
                Ok(Ok(())) => true,
                Ok(Err(e)) => {
                    error!("page {} failed: {}", index + 1, e);
                    false
                }
                Err(e) => {
                    error!("page {} download task failed: {}", index + 1, e);
                    false
                }
            })
            .collect()
    }

    async fn fetch_attempt(
        &self,
        dest: &Path,
        url: &str,
    ) -> std::result::Result<(), AttemptFailure> {
        let headers = browser_headers(url, &self.settings).map_err(AttemptFailure::Headers)?;
        let response = self
            .client
            .get(url)
            .headers(headers)
            .send()
            .await
            .map_err(AttemptFailure::Transport)?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.bytes().await.map(|b| b.to_vec()).unwrap_or_default();
            return Err(AttemptFailure::Status(status, body));
        }

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);
        if !content_type.as_deref().is_some_and(|ct| ct.contains("image")) {
            let body = response.bytes().await.map(|b| b.to_vec()).unwrap_or_default();
            return Err(AttemptFailure::ContentType(content_type, body));
        }

        let mut file = fs::File::create(dest).await.map_err(AttemptFailure::Io)?;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(AttemptFailure::Transport)?;
            file.write_all(&chunk).await.map_err(AttemptFailure::Io)?;
        }
        file.flush().await.map_err(AttemptFailure::Io)?;
        drop(file);

        // A 200 with an image content type can still carry a broken body;
        // only a full decode counts as a valid download.
        let verify_path = dest.to_path_buf();
        match spawn_blocking(move || open_image(&verify_path).map(|_| ())).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(AttemptFailure::InvalidImage(e)),
            Err(e) => Err(AttemptFailure::Join(e)),
        }
    }
}

/// Builds the browser-like header set for an image request. The `Host`
/// header is derived from the image URL's own domain. `Accept-Encoding` is
/// left to the client so response decompression stays enabled.
fn browser_headers(
    url: &str,
    settings: &FetchSettings,
) -> std::result::Result<HeaderMap, String> {
    let parsed = Url::parse(url).map_err(|e| format!("invalid image URL {}: {}", url, e))?;
    let mut host = parsed
        .host_str()
        .ok_or_else(|| format!("image URL has no host: {}", url))?
        .to_string();
    if let Some(port) = parsed.port() {
        host = format!("{}:{}", host, port);
    }

    let mut headers = HeaderMap::new();
    headers.insert(
        header::ACCEPT,
        HeaderValue::from_static("image/webp,image/png,image/*;q=0.8,video/*;q=0.8,*/*;q=0.5"),
    );
    headers.insert(
        header::USER_AGENT,
        HeaderValue::from_str(&settings.user_agent).map_err(|e| e.to_string())?,
    );
    headers.insert(
        header::HOST,
        HeaderValue::from_str(&host).map_err(|e| e.to_string())?,
    );
    headers.insert(header::ACCEPT_LANGUAGE, HeaderValue::from_static("en-ca"));
    headers.insert(
        header::REFERER,
        HeaderValue::from_str(&settings.referer).map_err(|e| e.to_string())?,
    );
    headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
    Ok(headers)
}

/// Path of the diagnostic artifact for an exhausted download,
/// e.g. `3.webp` -> `error_3.webp.html`.
fn diagnostic_path(dest: &Path) -> PathBuf {
    let name = dest
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "page".to_string());
    match dest.parent() {
        Some(parent) => parent.join(format!("error_{}.html", name)),
        None => PathBuf::from(format!("error_{}.html", name)),
    }
}
