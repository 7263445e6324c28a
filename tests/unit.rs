//! Unit tests for core Tankobon functionality.
//!
//! Tests individual components in isolation without full pipeline execution.

use image::Rgb;
use tankobon::error::Result;
use tankobon::normalizer::normalize_width;
use tankobon::prelude::*;

mod common;
use common::{create_dummy_image, setup_test_dirs};

#[tokio::test]
async fn test_config_builder_validation() -> Result<()> {
    let result = TankobonConfig::builder()
        .output_dir(PathBuf::from("/tmp/out"))
        .jpeg_quality(0u8)
        .build();
    assert!(result.is_err());
    assert!(result.unwrap_err().to_string().contains("JPEG quality"));

    let result = TankobonConfig::builder()
        .output_dir(PathBuf::from("/tmp/out"))
        .retry_attempts(0u32)
        .build();
    assert!(result.is_err());
    assert!(
        result
            .unwrap_err()
            .to_string()
            .contains("At least one fetch attempt")
    );

    let result = TankobonConfig::builder()
        .output_dir(PathBuf::from("/tmp/out"))
        .fetch_concurrency(0usize)
        .build();
    assert!(result.is_err());

    Ok(())
}

#[tokio::test]
async fn test_config_defaults_and_preflight() -> Result<()> {
    // Missing output_dir passes the builder but fails preflight.
    let config = TankobonConfig::builder().build()?;
    assert!(config.preflight_check().is_err());

    let config = TankobonConfig::builder()
        .output_dir(PathBuf::from("/tmp/out"))
        .build()?;
    assert!(config.preflight_check().is_ok());
    assert_eq!(config.retry_attempts, 5);
    assert_eq!(config.jpeg_quality, 85);
    assert_eq!(config.work_root, PathBuf::from("Temp"));
    Ok(())
}

#[tokio::test]
async fn test_normalize_width_resizes_to_target() -> Result<()> {
    let dirs = setup_test_dirs("normalize_resize").await;
    let page1 = dirs.work_root.join("1.webp");
    let page2 = dirs.work_root.join("2.webp");
    create_dummy_image(&page1, 400, 600, Rgb([200, 10, 10])).await;
    create_dummy_image(&page2, 200, 100, Rgb([10, 200, 10])).await;

    let normalized = normalize_width(vec![page1, page2], 400, 85).await?;
    assert_eq!(normalized.len(), 2);
    for page in &normalized {
        assert_eq!(page.status, PageStatus::Resized);
        assert!(page.path.to_string_lossy().ends_with("_resized.jpg"));
    }

    // Aspect ratio preserved against the shared target width.
    assert_eq!(image::image_dimensions(&normalized[0].path)?, (400, 600));
    assert_eq!(image::image_dimensions(&normalized[1].path)?, (400, 200));
    Ok(())
}

#[tokio::test]
async fn test_normalize_width_is_idempotent() -> Result<()> {
    let dirs = setup_test_dirs("normalize_idempotent").await;
    let page = dirs.work_root.join("1.webp");
    create_dummy_image(&page, 800, 1200, Rgb([80, 80, 200])).await;

    let first_pass = normalize_width(vec![page], 800, 85).await?;
    let first_dims = image::image_dimensions(&first_pass[0].path)?;
    assert_eq!(first_dims, (800, 1200));

    // Resizing again at the same width must not drift.
    let second_pass = normalize_width(vec![first_pass[0].path.clone()], 800, 85).await?;
    assert_eq!(image::image_dimensions(&second_pass[0].path)?, first_dims);
    Ok(())
}

#[tokio::test]
async fn test_normalize_width_skips_unreadable_image() -> Result<()> {
    let dirs = setup_test_dirs("normalize_skip").await;
    let good = dirs.work_root.join("1.webp");
    let broken = dirs.work_root.join("2.webp");
    create_dummy_image(&good, 300, 300, Rgb([0, 0, 0])).await;
    tokio::fs::write(&broken, b"<html>not an image</html>")
        .await
        .unwrap();

    let normalized = normalize_width(vec![good, broken.clone()], 300, 85).await?;
    assert_eq!(normalized[0].status, PageStatus::Resized);
    assert_eq!(normalized[1].status, PageStatus::Skipped);
    // The unreadable page keeps its original path so callers can inspect it.
    assert_eq!(normalized[1].path, broken);
    Ok(())
}

#[test]
fn test_chapter_report_pages_written() {
    let report = ChapterReport {
        chapter: "Chapter 1".to_string(),
        pages: vec![
            PageStatus::Resized,
            PageStatus::UsedOriginal,
            PageStatus::Failed,
            PageStatus::Skipped,
            PageStatus::Resized,
        ],
        document: Some(PathBuf::from("/tmp/out/Chapter 1.pdf")),
    };
    assert_eq!(report.pages_written(), 3);
}
