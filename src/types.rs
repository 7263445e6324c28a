//! Core data types and reports for the Tankobon download pipeline.
//!
//! This module defines the fundamental data structures used throughout Tankobon:
//! - The resolved chapter handle (`Chapter`)
//! - The per-page processing outcome (`PageStatus`)
//! - The per-chapter result summary (`ChapterReport`)

use std::path::PathBuf;

use crate::error::{Error, Result};

/// File extension used for raw downloaded page images.
///
/// The i-th page URL (0-based) of a chapter is always saved as
/// `<i + 1>.webp` inside the chapter's working directory; the final document
/// recovers page order from this naming scheme alone.
pub const PAGE_EXTENSION: &str = "webp";

/// One named unit of the source comic, as resolved from the chapter index.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Chapter {
    /// Human-readable chapter name, used for the output filename.
    pub name: String,
    /// Absolute URL of the chapter's reader page.
    pub url: String,
}

/// Observable outcome for a single page of a chapter.
///
/// Degradation is per page and never aborts the chapter (with the one
/// exception of page 1, which establishes the chapter's target width).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PageStatus {
    /// Downloaded, resampled to the chapter's target width and re-encoded.
    Resized,
    /// Downloaded, but resampling failed; the original image was re-encoded
    /// as JPEG at its original dimensions instead.
    UsedOriginal,
    /// Downloaded, but unreadable; the page is absent from the document.
    Skipped,
    /// Download used up its whole attempt budget; the page is absent from
    /// the document.
    Failed,
}

/// Summary of one chapter pipeline run.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ChapterReport {
    /// The chapter name the run was started with.
    pub chapter: String,
    /// Per-page outcomes in ascending page order.
    pub pages: Vec<PageStatus>,
    /// Path of the merged chapter document, or `None` when the chapter
    /// aborted before a document could be produced.
    pub document: Option<PathBuf>,
}

impl ChapterReport {
    /// Number of pages that made it into the merged document.
    pub fn pages_written(&self) -> usize {
        self.pages
            .iter()
            .filter(|s| matches!(s, PageStatus::Resized | PageStatus::UsedOriginal))
            .count()
    }
}

/// Utility function: Determines file type and MIME type from a file path
///
/// # Arguments
///
/// * `image_path` - Path to the file to analyze
///
/// # Returns
///
/// * `Ok((&str, &str))` - A tuple containing (file extension, MIME type)
/// * `Err(Error)` - An error if the file format is unsupported
///
/// # Supported formats
///
/// - JPEG/JPG: image/jpeg
/// - PNG: image/png
/// - WebP: image/webp
pub fn get_file_info(image_path: &PathBuf) -> Result<(&'static str, &'static str)> {
    let path = image_path.extension().and_then(|e| e.to_str());

    match path {
        Some("jpg") | Some("jpeg") => Ok(("jpg", "image/jpeg")),
        Some("png") => Ok(("png", "image/png")),
        Some("webp") => Ok(("webp", "image/webp")),
        _ => Err(Error::Other(format!("Unsupported image format {:#?}", path))),
    }
}
