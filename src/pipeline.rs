//! The per-chapter pipeline: fetch, normalize, assemble.
//!
//! Composes the fetch orchestrator, the width normalizer and the PDF
//! generator for a single chapter, and owns the chapter's working directory
//! for the whole run. The working directory is created before any download
//! starts and removed again on every exit path, successful or not.

use std::path::{Path, PathBuf};

use image::GenericImageView;
use log::{info, warn};
use tokio::fs;
use tokio::task::spawn_blocking;

use crate::error::{Error, Result};
use crate::fetcher::PageFetcher;
use crate::generator::Generator;
use crate::generator::pdf::Pdf;
use crate::normalizer::{normalize_width, open_image};
use crate::path_utils::sanitize_filename;
use crate::types::{ChapterReport, PAGE_EXTENSION, PageStatus};

/// Downloads one chapter's pages and binds them into a merged PDF under
/// `output_dir`.
///
/// `page_urls` must be in reading order; the i-th URL becomes page i + 1.
/// Pages degrade individually (see [`PageStatus`]); the one chapter-fatal
/// case is page 1 being missing or unreadable, since it establishes the
/// target width for every other page.
pub async fn process_chapter(
    fetcher: &PageFetcher,
    name: &str,
    page_urls: &[String],
    work_root: &Path,
    output_dir: &Path,
    jpeg_quality: u8,
) -> Result<ChapterReport> {
    let workdir = work_root.join(sanitize_filename(name));
    fs::create_dir_all(&workdir).await?;

    let result = run_pipeline(fetcher, name, page_urls, &workdir, output_dir, jpeg_quality).await;

    // The working directory never outlives its chapter's run.
    if let Err(e) = fs::remove_dir_all(&workdir).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!("could not remove working directory {:?}: {}", workdir, e);
        }
    }

    result
}

async fn run_pipeline(
    fetcher: &PageFetcher,
    name: &str,
    page_urls: &[String],
    workdir: &Path,
    output_dir: &Path,
    jpeg_quality: u8,
) -> Result<ChapterReport> {
    info!("downloading chapter '{}' ({} pages)", name, page_urls.len());

    let fetched = fetcher.fetch_all(page_urls, workdir).await;
    let mut statuses = vec![PageStatus::Failed; page_urls.len()];

    // Page 1 sets the document width for the whole chapter.
    let first_page = workdir.join(format!("1.{}", PAGE_EXTENSION));
    let probe = first_page.clone();
    let target_width = spawn_blocking(move || open_image(&probe).map(|img| img.dimensions().0))
        .await?
        .map_err(|_| Error::FirstPageUnreadable(first_page))?;

    let fetched_indices: Vec<usize> = (0..page_urls.len()).filter(|&i| fetched[i]).collect();
    let fetched_paths: Vec<PathBuf> = fetched_indices
        .iter()
        .map(|&i| workdir.join(format!("{}.{}", i + 1, PAGE_EXTENSION)))
        .collect();

    let normalized = normalize_width(fetched_paths, target_width, jpeg_quality).await?;

    let mut generator = Pdf::new(output_dir, name, workdir)?;
    for (&slot, page) in fetched_indices.iter().zip(normalized) {
        match page.status {
            PageStatus::Skipped => statuses[slot] = PageStatus::Skipped,
            status => {
                statuses[slot] = if generator.add_page(&page.path).await? {
                    status
                } else {
                    PageStatus::Skipped
                };
            }
        }
    }

    let document = generator.save().await?;
    info!("chapter '{}' written to {:?}", name, document);

    Ok(ChapterReport {
        chapter: name.to_string(),
        pages: statuses,
        document: Some(document),
    })
}
