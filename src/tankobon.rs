use std::path::PathBuf;
use std::time::Duration;

use log::{error, info};

use crate::error::{Error, Result};
use crate::fetcher::{DEFAULT_REFERER, DEFAULT_USER_AGENT, FetchSettings, PageFetcher};
use crate::pipeline::process_chapter;
use crate::resolver::LinkResolver;
use crate::types::{Chapter, ChapterReport};

/// The main Tankobon download configuration, built declaratively using the
/// builder pattern.
///
/// This struct encapsulates all settings needed to turn a comic's chapters
/// into one merged PDF per chapter: where the documents go, where scratch
/// files live, and how downloads behave. Once configured, it can execute the
/// pipeline through two entry points:
///
/// - [`download_comic`](TankobonConfig::download_comic): resolve the chapter
///   index and process every chapter sequentially
/// - [`download_chapter`](TankobonConfig::download_chapter): process a single
///   chapter from already-known page URLs
///
/// ## Builder Pattern
///
/// Use [`TankobonConfig::builder()`](TankobonConfig::builder) to create a new
/// configuration:
///
/// ```rust,no_run
/// # use tankobon::prelude::*;
/// # use std::path::PathBuf;
/// let config = TankobonConfig::builder()
///     .output_dir(PathBuf::from("./comics/My Series"))
///     .build()
///     .expect("Invalid configuration");
/// ```
#[derive(Debug, Clone, derive_builder::Builder)]
#[builder(setter(into, strip_option), build_fn(validate = "Self::validate"))]
pub struct TankobonConfig {
    /// Directory where merged chapter documents are written, one
    /// `<chapter_name>.pdf` per chapter.
    #[builder(default)]
    pub output_dir: PathBuf,

    /// Root directory for per-chapter scratch space.
    ///
    /// Each chapter gets its own working directory
    /// `<work_root>/<sanitized chapter name>`, created when the chapter
    /// starts and removed when it ends, on success and on failure alike.
    /// The process current directory is never changed.
    #[builder(default = "PathBuf::from(\"Temp\")")]
    pub work_root: PathBuf,

    /// Upper bound on concurrently running page downloads within a chapter.
    #[builder(default = "num_cpus::get().min(8)")]
    pub fetch_concurrency: usize,

    /// Total attempt budget per page image, including the first attempt.
    #[builder(default = "5")]
    pub retry_attempts: u32,

    /// Base unit for the exponential retry backoff; the wait before retry k
    /// (1-based) is `backoff_base * 2^(k-1)`.
    #[builder(default = "Duration::from_secs(1)")]
    pub backoff_base: Duration,

    /// Per-attempt transport timeout for all HTTP requests.
    #[builder(default = "Duration::from_secs(30)")]
    pub request_timeout: Duration,

    /// JPEG quality (1-100) used when page images are re-encoded after
    /// resizing.
    #[builder(default = "85")]
    pub jpeg_quality: u8,

    /// User agent advertised on image requests.
    #[builder(default = "DEFAULT_USER_AGENT.to_string()")]
    pub user_agent: String,

    /// Referer advertised on image requests, to reduce blocking by the
    /// source site.
    #[builder(default = "DEFAULT_REFERER.to_string()")]
    pub referer: String,
}

impl TankobonConfig {
    /// Creates a new builder for configuring `TankobonConfig`.
    pub fn builder() -> TankobonConfigBuilder {
        TankobonConfigBuilder::default()
    }

    /// Performs validation checks on the configuration.
    ///
    /// The `download_*` methods call this automatically, so manual
    /// invocation is optional but useful for early error detection.
    pub fn preflight_check(&self) -> Result<&Self> {
        if self.output_dir.as_os_str().is_empty() {
            return Err(Error::Other("Output directory is required".to_string()));
        }
        if self.work_root.as_os_str().is_empty() {
            return Err(Error::Other("Work root is required".to_string()));
        }
        Ok(self)
    }

    /// Resolves the chapter index at `index_url` and downloads every chapter
    /// sequentially, one merged PDF per chapter.
    ///
    /// A chapter whose links cannot be resolved or whose pipeline fails is
    /// logged and reported with `document: None`; the run continues with the
    /// next chapter. Only an unusable chapter index aborts the whole run,
    /// since there is nothing left to iterate.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// # use tankobon::prelude::*;
    /// # use std::path::PathBuf;
    /// # #[tokio::main]
    /// # async fn main() -> tankobon::error::Result<()> {
    /// let config = TankobonConfig::builder()
    ///     .output_dir(PathBuf::from("./comics/My Series"))
    ///     .build()?;
    ///
    /// let reports = config.download_comic("https://example.com/comic/my-series").await?;
    /// for report in &reports {
    ///     println!("{}: {} pages written", report.chapter, report.pages_written());
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub async fn download_comic(&self, index_url: &str) -> Result<Vec<ChapterReport>> {
        self.preflight_check()?;
        let resolver = LinkResolver::new(self.request_timeout)?;
        let fetcher = PageFetcher::new(self.fetch_settings())?;

        let chapters = resolver.chapter_links(index_url).await?;
        info!("resolved {} chapters from {}", chapters.len(), index_url);

        let mut reports = Vec::with_capacity(chapters.len());
        for Chapter { name, url } in chapters {
            let outcome = match resolver.page_links(&url).await {
                Ok(page_urls) => {
                    process_chapter(
                        &fetcher,
                        &name,
                        &page_urls,
                        &self.work_root,
                        &self.output_dir,
                        self.jpeg_quality,
                    )
                    .await
                }
                Err(e) => Err(e),
            };

            match outcome {
                Ok(report) => reports.push(report),
                Err(e) => {
                    error!("chapter '{}' failed: {}", name, e);
                    reports.push(ChapterReport {
                        chapter: name,
                        pages: Vec::new(),
                        document: None,
                    });
                }
            }
        }
        Ok(reports)
    }

    /// Downloads a single chapter from already-resolved page URLs.
    ///
    /// `page_urls` must be in reading order. Returns the chapter's
    /// [`ChapterReport`] with per-page outcomes, or an error when the
    /// chapter is fatally unprocessable (see
    /// [`Error::FirstPageUnreadable`]).
    pub async fn download_chapter(
        &self,
        name: &str,
        page_urls: &[String],
    ) -> Result<ChapterReport> {
        self.preflight_check()?;
        let fetcher = PageFetcher::new(self.fetch_settings())?;
        process_chapter(
            &fetcher,
            name,
            page_urls,
            &self.work_root,
            &self.output_dir,
            self.jpeg_quality,
        )
        .await
    }

    fn fetch_settings(&self) -> FetchSettings {
        FetchSettings {
            user_agent: self.user_agent.clone(),
            referer: self.referer.clone(),
            retry_attempts: self.retry_attempts,
            backoff_base: self.backoff_base,
            request_timeout: self.request_timeout,
            concurrency: self.fetch_concurrency,
        }
    }
}

impl TankobonConfigBuilder {
    fn validate(&self) -> std::result::Result<(), String> {
        if let Some(quality) = self.jpeg_quality {
            if quality == 0 || quality > 100 {
                return Err("JPEG quality must be between 1 and 100.".to_string());
            }
        }
        if let Some(attempts) = self.retry_attempts {
            if attempts == 0 {
                return Err("At least one fetch attempt is required.".to_string());
            }
        }
        if let Some(concurrency) = self.fetch_concurrency {
            if concurrency == 0 {
                return Err("Fetch concurrency must be at least 1.".to_string());
            }
        }
        Ok(())
    }
}
