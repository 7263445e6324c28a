//! Generator module provides the trait and implementation for chapter
//! document assembly.
//!
//! This module contains the common interface for document generators and the
//! PDF implementation that binds a chapter's page images into one merged,
//! paginated file.

use crate::error::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

pub mod pdf;

/// Common interface for chapter document generators.
///
/// A generator accumulates pages one image at a time and produces a single
/// merged document on [`save`](Generator::save). Pages are numbered in the
/// order they are added.
#[async_trait]
pub trait Generator {
    /// Creates a new generator instance.
    ///
    /// # Parameters
    /// * `output_dir` - Directory where the merged document will be saved
    /// * `chapter_name` - Base name of the output file (without extension)
    /// * `work_dir` - Scratch directory for intermediate per-page documents
    ///
    /// # Returns
    /// * `Result<Self>` - A new generator instance or an error if creation fails
    fn new(output_dir: &Path, chapter_name: &str, work_dir: &Path) -> Result<Self>
    where
        Self: Sized;

    /// Adds a page to the document from an image file.
    ///
    /// # Parameters
    /// * `image_path` - Path to the image file to add as a page
    ///
    /// # Returns
    /// * `Ok(true)` - the page was embedded
    /// * `Ok(false)` - the image was missing or unreadable and was skipped
    /// * `Err(Error)` - a hard failure writing the page document
    async fn add_page(&mut self, image_path: &Path) -> Result<bool>
    where
        Self: Sized;

    /// Merges the accumulated pages and writes the final document.
    ///
    /// Consumes the generator. Intermediate per-page artifacts are removed
    /// whether or not individual pages were skipped.
    ///
    /// # Returns
    /// * `Result<PathBuf>` - Path of the merged document
    async fn save(self) -> Result<PathBuf>;
}
