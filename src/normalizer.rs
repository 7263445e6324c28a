//! Width normalization of downloaded page images.
//!
//! All pages of a chapter are resampled to the pixel width of page 1 so the
//! merged document has a uniform page width. The batch runs on the rayon
//! pool inside a blocking task; result order always matches input order.

use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use image::DynamicImage;
use image::GenericImageView;
use image::ImageReader;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use log::warn;
use rayon::prelude::*;
use tokio::task::spawn_blocking;

use crate::error::{Error, Result};
use crate::types::PageStatus;

/// A page after the normalization pass: the path assembly should use and
/// the outcome that got it there.
#[derive(Debug, Clone)]
pub struct NormalizedPage {
    pub path: PathBuf,
    pub status: PageStatus,
}

/// Opens an image by sniffing its content rather than trusting the file
/// extension; raw pages are saved as `.webp` regardless of what the source
/// actually served.
pub(crate) fn open_image(path: &Path) -> image::ImageResult<DynamicImage> {
    ImageReader::open(path)?.with_guessed_format()?.decode()
}

/// Resizes every image in `paths` to `target_width`, preserving aspect
/// ratio, and re-encodes each as JPEG at `quality`.
///
/// Runs the whole batch in parallel; the returned vector matches the input
/// order regardless of completion order. A page that cannot be resampled is
/// re-encoded at its original dimensions (`UsedOriginal`); a page that
/// cannot be read at all keeps its original path and is marked `Skipped`
/// so assembly leaves it out.
pub async fn normalize_width(
    paths: Vec<PathBuf>,
    target_width: u32,
    quality: u8,
) -> Result<Vec<NormalizedPage>> {
    spawn_blocking(move || {
        paths
            .par_iter()
            .map(|path| resize_to_width(path, target_width, quality))
            .collect()
    })
    .await
    .map_err(Error::Join)
}

/// Resizes a single image to the target width, falling back per the ladder
/// described on [`normalize_width`]. Never fails the batch.
pub fn resize_to_width(path: &Path, target_width: u32, quality: u8) -> NormalizedPage {
    let output = resized_output_path(path);

    match try_resize(path, &output, target_width, quality) {
        Ok(()) => NormalizedPage {
            path: output,
            status: PageStatus::Resized,
        },
        Err(resize_err) => {
            warn!("could not resize {:?}: {}", path, resize_err);
            match try_reencode(path, &output, quality) {
                Ok(()) => NormalizedPage {
                    path: output,
                    status: PageStatus::UsedOriginal,
                },
                Err(reencode_err) => {
                    warn!("could not re-encode {:?}: {}", path, reencode_err);
                    NormalizedPage {
                        path: path.to_path_buf(),
                        status: PageStatus::Skipped,
                    }
                }
            }
        }
    }
}

fn try_resize(path: &Path, output: &Path, target_width: u32, quality: u8) -> Result<()> {
    let img = open_image(path)?;
    let (width, height) = img.dimensions();
    if width == 0 {
        return Err(Error::Other(format!("zero-width image {:?}", path)));
    }

    let target_height = ((target_width as f64 / width as f64) * height as f64) as u32;
    let resized = img.resize_exact(target_width, target_height.max(1), FilterType::Lanczos3);
    encode_jpeg(&resized, output, quality)
}

fn try_reencode(path: &Path, output: &Path, quality: u8) -> Result<()> {
    let img = open_image(path)?;
    encode_jpeg(&img, output, quality)
}

fn encode_jpeg(img: &DynamicImage, output: &Path, quality: u8) -> Result<()> {
    let rgb = img.to_rgb8();
    let file = std::fs::File::create(output)?;
    let mut writer = BufWriter::new(file);
    let mut encoder = JpegEncoder::new_with_quality(&mut writer, quality);
    encoder.encode_image(&rgb)?;
    writer.flush()?;
    Ok(())
}

/// Output path for a resized page, e.g. `3.webp` -> `3_resized.jpg`.
fn resized_output_path(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "page".to_string());
    path.with_file_name(format!("{}_resized.jpg", stem))
}
