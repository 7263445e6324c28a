//! Common test utilities and constants for the Tankobon crate.
//!
//! Provides functions for setting up unique test directories, generating
//! dummy page images, mounting image routes on a wiremock server, and
//! inspecting generated PDFs.

use image::{Rgb, RgbImage};
use rand::{Rng, distributions::Alphanumeric};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[allow(dead_code)]
pub const TEST_TMP_DIR: &str = "tests/tmp";
#[allow(dead_code)]
pub const TEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Directory layout for one test: an output directory for merged documents
/// and a scratch root for chapter working directories.
#[allow(dead_code)]
pub struct TestDirs {
    pub base_dir: PathBuf,
    pub output_dir: PathBuf,
    pub work_root: PathBuf,
}

/// Creates a clean, uniquely-named test directory with output and work
/// subdirectories.
#[allow(dead_code)]
pub async fn setup_test_dirs(sub_path: &str) -> TestDirs {
    let rand_string: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(8)
        .map(char::from)
        .collect();
    let base_dir = PathBuf::from(TEST_TMP_DIR).join(format!("{}-{}", sub_path, rand_string));
    if base_dir.exists() {
        fs::remove_dir_all(&base_dir).await.unwrap();
    }
    let output_dir = base_dir.join("output");
    let work_root = base_dir.join("work");

    fs::create_dir_all(&output_dir).await.unwrap();
    fs::create_dir_all(&work_root).await.unwrap();

    TestDirs {
        base_dir,
        output_dir,
        work_root,
    }
}

/// Encodes a solid-color JPEG of the given dimensions in memory.
#[allow(dead_code)]
pub fn jpeg_bytes(width: u32, height: u32, color: Rgb<u8>) -> Vec<u8> {
    let mut img = RgbImage::new(width, height);
    for pixel in img.pixels_mut() {
        *pixel = color;
    }
    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Jpeg)
        .unwrap();
    bytes
}

/// Writes a solid-color JPEG image file at the given path.
#[allow(dead_code)]
pub async fn create_dummy_image(target: &Path, width: u32, height: u32, color: Rgb<u8>) {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).await.unwrap();
    }
    fs::write(target, jpeg_bytes(width, height, color))
        .await
        .unwrap();
}

/// Mounts a route on the mock server that serves a valid page image.
#[allow(dead_code)]
pub async fn mount_image(server: &MockServer, route: &str, width: u32, height: u32) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(jpeg_bytes(width, height, Rgb([120, 40, 40])), "image/webp"),
        )
        .mount(server)
        .await;
}

/// Number of pages in a PDF file.
#[allow(dead_code)]
pub fn count_pdf_pages(path: &Path) -> usize {
    let doc = lopdf::Document::load(path).unwrap();
    doc.get_pages().len()
}

/// MediaBox heights (in PDF points) of every page, in page order.
#[allow(dead_code)]
pub fn pdf_page_heights(path: &Path) -> Vec<f32> {
    let doc = lopdf::Document::load(path).unwrap();
    doc.get_pages()
        .values()
        .map(|page_id| {
            let page = doc.get_object(*page_id).unwrap().as_dict().unwrap();
            let media_box = page.get(b"MediaBox").unwrap().as_array().unwrap();
            match &media_box[3] {
                lopdf::Object::Real(value) => *value as f32,
                lopdf::Object::Integer(value) => *value as f32,
                other => panic!("unexpected MediaBox entry: {:?}", other),
            }
        })
        .collect()
}
