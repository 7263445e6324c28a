//! Integration tests for the Tankobon crate.
//!
//! These tests run chapter pipelines against a local mock HTTP server and
//! validate the merged PDF output, per-page statuses and cleanup behavior.

use std::time::{Duration, Instant};

use tankobon::error::{Error, Result};
use tankobon::fetcher::{FetchSettings, PageFetcher};
use tankobon::prelude::*;
use tokio::time::timeout;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

mod common;
use common::{TEST_TIMEOUT, count_pdf_pages, mount_image, pdf_page_heights, setup_test_dirs};

fn test_config(dirs: &common::TestDirs) -> Result<TankobonConfig> {
    Ok(TankobonConfig::builder()
        .output_dir(dirs.output_dir.clone())
        .work_root(dirs.work_root.clone())
        .backoff_base(Duration::from_millis(2))
        .build()?)
}

#[tokio::test]
async fn test_chapter_with_three_valid_pages() -> Result<()> {
    let dirs = setup_test_dirs("three_valid_pages").await;
    let server = MockServer::start().await;
    mount_image(&server, "/pages/1", 800, 1200).await;
    mount_image(&server, "/pages/2", 820, 1200).await;
    mount_image(&server, "/pages/3", 790, 1100).await;

    let urls: Vec<String> = (1..=3).map(|i| format!("{}/pages/{}", server.uri(), i)).collect();
    let config = test_config(&dirs)?;

    let report = timeout(TEST_TIMEOUT, config.download_chapter("Chapter 1", &urls))
        .await
        .expect("Test timed out")?;

    let expected_pdf = dirs.output_dir.join("Chapter 1.pdf");
    assert_eq!(report.document.as_deref(), Some(expected_pdf.as_path()));
    assert!(expected_pdf.exists());
    assert_eq!(count_pdf_pages(&expected_pdf), 3);
    assert_eq!(report.pages, vec![PageStatus::Resized; 3]);
    assert_eq!(report.pages_written(), 3);

    // Cleanup invariant: only the merged document survives the run.
    assert!(!dirs.work_root.join("Chapter 1").exists());
    Ok(())
}

#[tokio::test]
async fn test_partial_failure_keeps_remaining_pages_in_order() -> Result<()> {
    let dirs = setup_test_dirs("partial_failure").await;
    let server = MockServer::start().await;
    for i in [1usize, 2, 4, 5] {
        mount_image(&server, &format!("/pages/{}", i), 800, 1000 + i as u32 * 50).await;
    }
    Mock::given(method("GET"))
        .and(path("/pages/3"))
        .respond_with(ResponseTemplate::new(500).set_body_string("server error"))
        .mount(&server)
        .await;

    let urls: Vec<String> = (1..=5).map(|i| format!("{}/pages/{}", server.uri(), i)).collect();
    let config = test_config(&dirs)?;

    let report = timeout(TEST_TIMEOUT, config.download_chapter("Chapter 3", &urls))
        .await
        .expect("Test timed out")?;

    let pdf = dirs.output_dir.join("Chapter 3.pdf");
    assert_eq!(count_pdf_pages(&pdf), 4);
    assert_eq!(
        report.pages,
        vec![
            PageStatus::Resized,
            PageStatus::Resized,
            PageStatus::Failed,
            PageStatus::Resized,
            PageStatus::Resized,
        ]
    );

    // The failing page used its full attempt budget.
    let requests = server.received_requests().await.unwrap();
    let attempts = requests.iter().filter(|r| r.url.path() == "/pages/3").count();
    assert_eq!(attempts, 5);

    // Remaining pages keep ascending source order: heights 1050, 1100, 1200, 1250.
    let heights = pdf_page_heights(&pdf);
    assert_eq!(heights.len(), 4);
    assert!(heights.windows(2).all(|pair| pair[0] < pair[1]));

    assert!(!dirs.work_root.join("Chapter 3").exists());
    Ok(())
}

#[tokio::test]
async fn test_retry_bound_and_diagnostic_artifact() -> Result<()> {
    let dirs = setup_test_dirs("retry_bound").await;
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/pages/1"))
        .respond_with(ResponseTemplate::new(500).set_body_string("permanent failure"))
        .mount(&server)
        .await;

    let settings = FetchSettings {
        retry_attempts: 5,
        backoff_base: Duration::from_millis(10),
        ..FetchSettings::default()
    };
    let fetcher = PageFetcher::new(settings)?;
    let dest = dirs.work_root.join("1.webp");
    let url = format!("{}/pages/1", server.uri());

    let started = Instant::now();
    let result = timeout(TEST_TIMEOUT, fetcher.fetch_page(&dest, &url))
        .await
        .expect("Test timed out");

    assert!(matches!(
        result,
        Err(Error::FetchExhausted { attempts: 5, .. })
    ));
    // Backoff before retries 1..4 waits 1+2+4+8 = 15 base units.
    assert!(started.elapsed() >= Duration::from_millis(150));

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 5);

    // No partial file, one diagnostic artifact with the failing body.
    assert!(!dest.exists());
    let diagnostic = dirs.work_root.join("error_1.webp.html");
    assert!(diagnostic.exists());
    let body = tokio::fs::read_to_string(&diagnostic).await?;
    assert_eq!(body, "permanent failure");
    Ok(())
}

#[tokio::test]
async fn test_unreadable_first_page_aborts_chapter() -> Result<()> {
    let dirs = setup_test_dirs("first_page_abort").await;
    let server = MockServer::start().await;
    // Claims to be an image but serves an HTML error page on every attempt.
    Mock::given(method("GET"))
        .and(path("/pages/1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw("<html>error</html>", "image/jpeg"),
        )
        .mount(&server)
        .await;
    mount_image(&server, "/pages/2", 800, 1200).await;

    let urls: Vec<String> = (1..=2).map(|i| format!("{}/pages/{}", server.uri(), i)).collect();
    let config = test_config(&dirs)?;

    let result = timeout(TEST_TIMEOUT, config.download_chapter("Chapter 1", &urls))
        .await
        .expect("Test timed out");
    assert!(matches!(result, Err(Error::FirstPageUnreadable(_))));

    // No document is produced and the working directory is gone.
    let mut entries = tokio::fs::read_dir(&dirs.output_dir).await?;
    assert!(entries.next_entry().await?.is_none());
    assert!(!dirs.work_root.join("Chapter 1").exists());
    Ok(())
}

#[tokio::test]
async fn test_page_order_is_independent_of_completion_order() -> Result<()> {
    let dirs = setup_test_dirs("completion_order").await;
    let server = MockServer::start().await;

    // Page 1 finishes last; order must still come from page numbering.
    Mock::given(method("GET"))
        .and(path("/pages/1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_millis(200))
                .set_body_raw(common::jpeg_bytes(800, 1000, image::Rgb([5, 5, 5])), "image/webp"),
        )
        .mount(&server)
        .await;
    mount_image(&server, "/pages/2", 800, 1100).await;
    mount_image(&server, "/pages/3", 800, 1200).await;

    let urls: Vec<String> = (1..=3).map(|i| format!("{}/pages/{}", server.uri(), i)).collect();
    let config = test_config(&dirs)?;

    let report = timeout(TEST_TIMEOUT, config.download_chapter("Chapter 7", &urls))
        .await
        .expect("Test timed out")?;
    assert_eq!(report.pages_written(), 3);

    let heights = pdf_page_heights(&dirs.output_dir.join("Chapter 7.pdf"));
    assert_eq!(heights.len(), 3);
    assert!(
        heights[0] < heights[1] && heights[1] < heights[2],
        "pages out of source order: {:?}",
        heights
    );
    Ok(())
}
