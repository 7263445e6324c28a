//! Tankobon - Web Comic to PDF Download Library
//!
//! This crate downloads a web comic's chapters (sequences of page images)
//! and binds each chapter into a single merged, paginated PDF: concurrent,
//! retrying image acquisition; width normalization against the chapter's
//! first page; and deterministic assembly in reading order.
//!
//! # Getting Started
//!
//! Configure a download task with the `TankobonConfig` builder, then execute
//! it with one of the `download_*` methods.
//!
//! ```rust,no_run
//! use tankobon::prelude::*;
//! use std::path::PathBuf;
//!
//! #[tokio::main]
//! async fn main() -> tankobon::error::Result<()> {
//!     let config = TankobonConfig::builder()
//!         .output_dir(PathBuf::from("./comics/My Series"))
//!         .work_root(PathBuf::from("Temp"))
//!         .build()?;
//!
//!     // Resolve the chapter index and download everything sequentially.
//!     let reports = config
//!         .download_comic("https://example.com/comic/my-series")
//!         .await?;
//!
//!     for report in &reports {
//!         println!("{}: {} pages written", report.chapter, report.pages_written());
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! Individual chapters can also be processed directly from known page URLs
//! via [`TankobonConfig::download_chapter`], skipping link resolution.

pub mod error;
pub mod fetcher;
pub mod generator;
pub mod normalizer;
pub mod path_utils;
pub mod pipeline;
pub mod resolver;
pub mod tankobon;
pub mod types;

// Publicly expose the main `TankobonConfig` struct and its builder
pub use tankobon::TankobonConfig;
pub use tankobon::TankobonConfigBuilder;

// Re-export error and core types for direct access
pub use types::{Chapter, ChapterReport, PageStatus};

/// Prelude module for convenient imports.
///
/// This module re-exports the most commonly used types, allowing you to
/// import everything you need with a single `use tankobon::prelude::*;`
/// statement.
pub mod prelude {
    pub use super::{
        Chapter, ChapterReport, PageStatus, TankobonConfig, TankobonConfigBuilder, error,
        generator, types,
    };
    pub use crate::fetcher::{FetchSettings, PageFetcher};
    pub use crate::resolver::LinkResolver;
    pub use std::path::{Path, PathBuf};
    pub use std::sync::Arc;
}
