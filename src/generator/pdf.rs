use std::collections::BTreeMap;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use log::warn;
use lopdf::{Document, Object, ObjectId};
use printpdf::{
    ColorBits, ColorSpace, Image, ImageFilter, ImageTransform, ImageXObject, Mm, PdfDocument, Px,
};
use tokio::fs;
use tokio::task::spawn_blocking;

use crate::error::{Error, Result};
use crate::generator::Generator;
use crate::normalizer::open_image;
use crate::path_utils::sanitize_filename;
use crate::types::get_file_info;

/// Pixel-to-millimeter conversion factor at 96 DPI.
pub const MM_PER_PX: f32 = 0.264583;
/// DPI matching [`MM_PER_PX`]; placing images at this DPI with scale 1.0
/// makes them cover their page exactly.
const PAGE_DPI: f32 = 96.0;

/// A generator that binds page images into a single merged PDF.
///
/// Every added page becomes its own single-page PDF in the working
/// directory, sized exactly to the image with no margins. [`save`] merges
/// them in page order, writes `{output_dir}/{chapter_name}.pdf` and removes
/// the intermediates.
pub struct Pdf {
    output_path: PathBuf,
    work_dir: PathBuf,
    title: String,
    intermediates: Vec<PathBuf>,
}

impl Pdf {
    /// Number of pages embedded so far.
    pub fn page_count(&self) -> usize {
        self.intermediates.len()
    }
}

#[async_trait]
impl Generator for Pdf {
    fn new(output_dir: &Path, chapter_name: &str, work_dir: &Path) -> Result<Self> {
        if !output_dir.exists() {
            std::fs::create_dir_all(output_dir)?;
        }
        if !work_dir.is_dir() {
            return Err(Error::InvalidPath(
                work_dir.to_path_buf(),
                "Working directory does not exist".to_string(),
            ));
        }

        let file_name = format!("{}.pdf", sanitize_filename(chapter_name));
        Ok(Pdf {
            output_path: output_dir.join(file_name),
            work_dir: work_dir.to_path_buf(),
            title: chapter_name.to_string(),
            intermediates: Vec::new(),
        })
    }

    async fn add_page(&mut self, image_path: &Path) -> Result<bool> {
        if !fs::try_exists(image_path).await.unwrap_or(false) {
            warn!("page image not found, skipping: {:?}", image_path);
            return Ok(false);
        }

        let target = self.work_dir.join(format!("{}.pdf", self.page_count() + 1));
        let image = image_path.to_path_buf();
        let target_clone = target.clone();
        let title = self.title.clone();

        let embedded =
            spawn_blocking(move || write_page_document(&image, &target_clone, &title)).await??;

        if embedded {
            self.intermediates.push(target);
            // The raw/resized image is no longer needed once embedded.
            let _ = fs::remove_file(image_path).await;
        }
        Ok(embedded)
    }

    async fn save(self) -> Result<PathBuf> {
        if self.intermediates.is_empty() {
            return Err(Error::Pdf("no pages were assembled".to_string()));
        }

        let intermediates = self.intermediates;
        let output_path = self.output_path;

        spawn_blocking(move || -> Result<PathBuf> {
            let mut documents = Vec::with_capacity(intermediates.len());
            for path in &intermediates {
                documents.push(Document::load(path)?);
            }

            let mut merged = merge_documents(documents)?;
            merged.save(&output_path)?;

            for path in &intermediates {
                let _ = std::fs::remove_file(path);
            }
            Ok(output_path)
        })
        .await?
    }
}

/// Writes a single-page PDF sized exactly to the image, or returns
/// `Ok(false)` when the image cannot be processed.
fn write_page_document(image_path: &Path, target: &Path, title: &str) -> Result<bool> {
    let (xobject, width_px, height_px) = match load_page_image(image_path) {
        Ok(loaded) => loaded,
        Err(e) => {
            warn!("cannot process page image {:?}: {}", image_path, e);
            return Ok(false);
        }
    };

    let width_mm = width_px as f32 * MM_PER_PX;
    let height_mm = height_px as f32 * MM_PER_PX;

    let (doc, page, layer) = PdfDocument::new(title, Mm(width_mm), Mm(height_mm), "Layer 1");
    let layer_ref = doc.get_page(page).get_layer(layer);

    Image::from(xobject).add_to_layer(
        layer_ref,
        ImageTransform {
            translate_x: Some(Mm(0.0)),
            translate_y: Some(Mm(0.0)),
            scale_x: Some(1.0),
            scale_y: Some(1.0),
            dpi: Some(PAGE_DPI),
            ..Default::default()
        },
    );

    let file = std::fs::File::create(target)?;
    let mut writer = BufWriter::new(file);
    doc.save(&mut writer)
        .map_err(|e| Error::Pdf(e.to_string()))?;
    Ok(true)
}

/// Loads an image as a PDF XObject together with its pixel dimensions.
///
/// JPEG files pass straight through as DCT-encoded data without a decode
/// round trip; anything else is decoded and re-encoded as JPEG first.
fn load_page_image(path: &Path) -> Result<(ImageXObject, u32, u32)> {
    let is_jpeg = matches!(get_file_info(&path.to_path_buf()), Ok(("jpg", _)));

    let (data, width, height) = if is_jpeg {
        let data = std::fs::read(path)?;
        let (width, height) = image::image_dimensions(path)?;
        (data, width, height)
    } else {
        let img = open_image(path)?;
        let rgb = img.to_rgb8();
        let (width, height) = rgb.dimensions();
        let mut data = Vec::new();
        let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut data, 85);
        encoder.encode_image(&rgb)?;
        (data, width, height)
    };

    let xobject = ImageXObject {
        width: Px(width as usize),
        height: Px(height as usize),
        color_space: ColorSpace::Rgb,
        bits_per_component: ColorBits::Bit8,
        interpolate: true,
        image_data: data,
        image_filter: Some(ImageFilter::DCT),
        clipping_bbox: None,
    };
    Ok((xobject, width, height))
}

/// Merges single-page documents into one, keeping input order.
///
/// Pages whose document failed to be produced upstream are simply absent
/// here; no placeholder is inserted.
fn merge_documents(documents: Vec<Document>) -> Result<Document> {
    let mut max_id = 1;
    let mut pages_in_order: Vec<(ObjectId, Object)> = Vec::new();
    let mut objects: BTreeMap<ObjectId, Object> = BTreeMap::new();

    for mut doc in documents {
        doc.renumber_objects_with(max_id);
        max_id = doc.max_id + 1;

        for (_, object_id) in doc.get_pages() {
            if let Ok(object) = doc.get_object(object_id) {
                pages_in_order.push((object_id, object.to_owned()));
            }
        }
        objects.extend(std::mem::take(&mut doc.objects));
    }

    let mut merged = Document::with_version("1.5");
    let mut catalog_object: Option<(ObjectId, Object)> = None;
    let mut pages_object: Option<(ObjectId, Object)> = None;

    for (object_id, object) in objects.iter() {
        match object.type_name().unwrap_or("") {
            "Catalog" => {
                catalog_object.get_or_insert((*object_id, object.clone()));
            }
            "Pages" => {
                if let Ok(dictionary) = object.as_dict() {
                    let mut dictionary = dictionary.clone();
                    if let Some((_, ref existing)) = pages_object {
                        if let Ok(existing_dictionary) = existing.as_dict() {
                            dictionary.extend(existing_dictionary);
                        }
                    }
                    pages_object = Some((
                        pages_object.map(|(id, _)| id).unwrap_or(*object_id),
                        Object::Dictionary(dictionary),
                    ));
                }
            }
            // Page objects are re-inserted below with their new parent.
            "Page" => {}
            _ => {
                merged.objects.insert(*object_id, object.clone());
            }
        }
    }

    let (pages_id, pages_root) = pages_object
        .ok_or_else(|| Error::Pdf("merge input has no Pages root".to_string()))?;
    let (catalog_id, catalog_root) = catalog_object
        .ok_or_else(|| Error::Pdf("merge input has no Catalog".to_string()))?;

    for (object_id, object) in &pages_in_order {
        if let Ok(dictionary) = object.as_dict() {
            let mut dictionary = dictionary.clone();
            dictionary.set("Parent", pages_id);
            merged
                .objects
                .insert(*object_id, Object::Dictionary(dictionary));
        }
    }

    if let Ok(dictionary) = pages_root.as_dict() {
        let mut dictionary = dictionary.clone();
        dictionary.set("Count", pages_in_order.len() as u32);
        dictionary.set(
            "Kids",
            pages_in_order
                .iter()
                .map(|(id, _)| Object::Reference(*id))
                .collect::<Vec<Object>>(),
        );
        merged.objects.insert(pages_id, Object::Dictionary(dictionary));
    }

    if let Ok(dictionary) = catalog_root.as_dict() {
        let mut dictionary = dictionary.clone();
        dictionary.set("Pages", pages_id);
        dictionary.remove(b"Outlines");
        merged
            .objects
            .insert(catalog_id, Object::Dictionary(dictionary));
    }

    merged.trailer.set("Root", catalog_id);
    merged.max_id = merged.objects.len() as u32;
    merged.renumber_objects();
    merged.compress();

    Ok(merged)
}
