//! Document preparation: PDF pages → text + images via pdfium, image files →
//! a single page.
//!
//! pdfium is CPU-bound and keeps thread-local state, so all PDF work runs on
//! `spawn_blocking`. Rendered pages are capped at `max_rendered_pixels` on
//! the long edge regardless of physical page size.

use crate::config::{ExtractionConfig, PageSelection};
use crate::error::ExtractError;
use crate::output::DocumentMetadata;
use crate::pipeline::enhance;
use crate::pipeline::input::DocumentKind;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Environment variable naming the pdfium library file or its directory.
pub const PDFIUM_LIB_PATH: &str = "PDFIUM_LIB_PATH";

/// One page of a prepared document.
#[derive(Debug, Clone)]
pub struct PageContent {
    /// 1-indexed.
    pub page_number: usize,
    /// Text layer of the page. Empty for image inputs.
    pub text: String,
    /// `None` when rendering failed for this page.
    pub image: Option<DynamicImage>,
    pub width: u32,
    pub height: u32,
}

/// A document reduced to per-page text and images.
#[derive(Debug, Clone)]
pub struct ProcessedDocument {
    pub kind: DocumentKind,
    pub path: PathBuf,
    pub pages: Vec<PageContent>,
    /// Every selected page's text as `--- Page N ---\n{text}`, joined by a
    /// blank line.
    pub text_content: String,
    pub metadata: DocumentMetadata,
}

impl ProcessedDocument {
    /// Pages that have an image, in page order.
    pub fn images(&self) -> impl Iterator<Item = (usize, &DynamicImage)> {
        self.pages
            .iter()
            .filter_map(|p| p.image.as_ref().map(|img| (p.page_number, img)))
    }

    pub fn image_count(&self) -> usize {
        self.pages.iter().filter(|p| p.image.is_some()).count()
    }

    pub fn has_images(&self) -> bool {
        self.image_count() > 0
    }

    /// Characters (not bytes) in `text_content`.
    pub fn text_length(&self) -> usize {
        self.text_content.chars().count()
    }
}

/// The rendering subset of [`ExtractionConfig`], owned so it can move onto
/// the blocking pool.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub dpi: u32,
    pub max_rendered_pixels: u32,
    pub password: Option<String>,
    pub pages: PageSelection,
    pub enhance_images: bool,
    pub page_image_dir: Option<PathBuf>,
}

impl RenderOptions {
    pub fn from_config(config: &ExtractionConfig) -> Self {
        Self {
            dpi: config.dpi,
            max_rendered_pixels: config.max_rendered_pixels,
            password: config.password.clone(),
            pages: config.pages.clone(),
            enhance_images: config.enhance_images,
            page_image_dir: config.page_image_dir.clone(),
        }
    }
}

/// Join page texts with `--- Page N ---` headers.
pub fn join_page_text(pages: &[PageContent]) -> String {
    pages
        .iter()
        .map(|p| format!("--- Page {} ---\n{}", p.page_number, p.text))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Load `path` into a [`ProcessedDocument`].
pub async fn load_document(
    path: &Path,
    kind: DocumentKind,
    config: &ExtractionConfig,
) -> Result<ProcessedDocument, ExtractError> {
    match kind {
        DocumentKind::Pdf => {
            let path = path.to_path_buf();
            let options = RenderOptions::from_config(config);
            tokio::task::spawn_blocking(move || load_pdf_blocking(&path, &options))
                .await
                .map_err(|e| ExtractError::Internal(format!("Render task panicked: {e}")))?
        }
        DocumentKind::Image => {
            let path = path.to_path_buf();
            tokio::task::spawn_blocking(move || load_image_blocking(&path))
                .await
                .map_err(|e| ExtractError::Internal(format!("Decode task panicked: {e}")))?
        }
    }
}

/// Metadata only; no rendering.
pub async fn extract_metadata(
    path: &Path,
    kind: DocumentKind,
    password: Option<&str>,
) -> Result<DocumentMetadata, ExtractError> {
    let path = path.to_path_buf();
    let pwd = password.map(str::to_string);
    tokio::task::spawn_blocking(move || match kind {
        DocumentKind::Pdf => pdf_metadata_blocking(&path, pwd.as_deref()),
        DocumentKind::Image => load_image_blocking(&path).map(|doc| doc.metadata),
    })
    .await
    .map_err(|e| ExtractError::Internal(format!("Metadata task panicked: {e}")))?
}

/// Bind to pdfium: `PDFIUM_LIB_PATH` first (a library file or a directory
/// holding the platform library), then the system loader paths.
pub fn bind_pdfium() -> Result<Pdfium, ExtractError> {
    if let Ok(configured) = std::env::var(PDFIUM_LIB_PATH) {
        let configured = PathBuf::from(configured);
        let lib = if configured.is_dir() {
            Pdfium::pdfium_platform_library_name_at_path(&configured)
        } else {
            configured
        };
        debug!("Binding pdfium from {}", lib.display());
        return Pdfium::bind_to_library(&lib)
            .map(Pdfium::new)
            .map_err(|e| ExtractError::PdfiumBindingFailed(format!("{}: {e}", lib.display())));
    }

    Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
        .or_else(|_| Pdfium::bind_to_system_library())
        .map(Pdfium::new)
        .map_err(|e| ExtractError::PdfiumBindingFailed(e.to_string()))
}

fn open_error(path: &Path, password: Option<&str>, e: PdfiumError) -> ExtractError {
    let err_str = format!("{e:?}");
    if err_str.to_ascii_lowercase().contains("password") {
        if password.is_some() {
            ExtractError::WrongPassword {
                path: path.to_path_buf(),
            }
        } else {
            ExtractError::PasswordRequired {
                path: path.to_path_buf(),
            }
        }
    } else {
        ExtractError::CorruptPdf {
            path: path.to_path_buf(),
            detail: err_str,
        }
    }
}

fn load_pdf_blocking(
    pdf_path: &Path,
    config: &RenderOptions,
) -> Result<ProcessedDocument, ExtractError> {
    let pdfium = bind_pdfium()?;
    let password = config.password.as_deref();
    let document = pdfium
        .load_pdf_from_file(pdf_path, password)
        .map_err(|e| open_error(pdf_path, password, e))?;

    let metadata = pdf_metadata(pdf_path, &document);
    let pages = document.pages();
    let total_pages = pages.len() as usize;
    info!("PDF loaded: {} pages", total_pages);

    let page_indices = config.pages.to_indices(total_pages);
    if page_indices.is_empty() {
        return Err(ExtractError::PageOutOfRange {
            page: 0,
            total: total_pages,
        });
    }

    let render_config = PdfRenderConfig::new()
        .scale_page_by_factor(config.dpi as f32 / 72.0)
        .set_maximum_width(config.max_rendered_pixels as i32)
        .set_maximum_height(config.max_rendered_pixels as i32);

    if let Some(ref dir) = config.page_image_dir {
        std::fs::create_dir_all(dir).map_err(|e| ExtractError::OutputWriteFailed {
            path: dir.clone(),
            source: e,
        })?;
    }

    let mut contents = Vec::with_capacity(page_indices.len());
    for idx in page_indices {
        let page_number = idx + 1;
        let page = pages
            .get(idx as u16)
            .map_err(|e| ExtractError::RasterisationFailed {
                page: page_number,
                detail: format!("{e:?}"),
            })?;

        let text = match page.text() {
            Ok(t) => t.all(),
            Err(e) => {
                warn!("Page {}: text layer unreadable: {:?}", page_number, e);
                String::new()
            }
        };

        let image = match page.render_with_config(&render_config) {
            Ok(bitmap) => {
                let rendered = bitmap.as_image();
                let img = if config.enhance_images {
                    enhance::enhance(&rendered)
                } else {
                    rendered
                };
                debug!(
                    "Rendered page {} → {}x{} px, {} chars of text",
                    page_number,
                    img.width(),
                    img.height(),
                    text.len()
                );
                Some(img)
            }
            Err(e) => {
                warn!("Page {}: rendering failed: {:?}", page_number, e);
                None
            }
        };

        if let (Some(dir), Some(img)) = (config.page_image_dir.as_ref(), image.as_ref()) {
            let file = dir.join(format!("page_{page_number}.png"));
            if let Err(e) = img.save_with_format(&file, image::ImageFormat::Png) {
                warn!("Could not save {}: {}", file.display(), e);
            }
        }

        let (width, height) = image
            .as_ref()
            .map(|i| (i.width(), i.height()))
            .unwrap_or((0, 0));
        contents.push(PageContent {
            page_number,
            text,
            image,
            width,
            height,
        });
    }

    Ok(ProcessedDocument {
        kind: DocumentKind::Pdf,
        path: pdf_path.to_path_buf(),
        text_content: join_page_text(&contents),
        pages: contents,
        metadata,
    })
}

fn load_image_blocking(path: &Path) -> Result<ProcessedDocument, ExtractError> {
    let decode_err = |detail: String| ExtractError::ImageDecodeFailed {
        path: path.to_path_buf(),
        detail,
    };
    let format = image::ImageFormat::from_path(path).ok();
    let img = image::open(path).map_err(|e| decode_err(e.to_string()))?;
    let (width, height) = (img.width(), img.height());
    debug!("Decoded image {} → {}x{} px", path.display(), width, height);

    let metadata = DocumentMetadata {
        file_path: path.display().to_string(),
        document_type: Some(DocumentKind::Image),
        page_count: 1,
        file_size_bytes: file_size(path),
        image_format: format.map(|f| format!("{f:?}")),
        color_type: Some(format!("{:?}", img.color())),
        width: Some(width),
        height: Some(height),
        ..Default::default()
    };

    let pages = vec![PageContent {
        page_number: 1,
        text: String::new(),
        image: Some(img),
        width,
        height,
    }];

    Ok(ProcessedDocument {
        kind: DocumentKind::Image,
        path: path.to_path_buf(),
        text_content: String::new(),
        pages,
        metadata,
    })
}

fn pdf_metadata_blocking(
    pdf_path: &Path,
    password: Option<&str>,
) -> Result<DocumentMetadata, ExtractError> {
    let pdfium = bind_pdfium()?;
    let document = pdfium
        .load_pdf_from_file(pdf_path, password)
        .map_err(|e| open_error(pdf_path, password, e))?;
    Ok(pdf_metadata(pdf_path, &document))
}

fn pdf_metadata(pdf_path: &Path, document: &PdfDocument) -> DocumentMetadata {
    let metadata = document.metadata();
    let get_meta = |tag: PdfDocumentMetadataTagType| -> Option<String> {
        metadata
            .get(tag)
            .map(|t| t.value().to_string())
            .filter(|v| !v.is_empty())
    };

    DocumentMetadata {
        file_path: pdf_path.display().to_string(),
        document_type: Some(DocumentKind::Pdf),
        page_count: document.pages().len() as usize,
        file_size_bytes: file_size(pdf_path),
        title: get_meta(PdfDocumentMetadataTagType::Title),
        author: get_meta(PdfDocumentMetadataTagType::Author),
        subject: get_meta(PdfDocumentMetadataTagType::Subject),
        creator: get_meta(PdfDocumentMetadataTagType::Creator),
        producer: get_meta(PdfDocumentMetadataTagType::Producer),
        creation_date: get_meta(PdfDocumentMetadataTagType::CreationDate),
        pdf_version: Some(format!("{:?}", document.version())),
        ..Default::default()
    }
}

fn file_size(path: &Path) -> u64 {
    std::fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn page(n: usize, text: &str, with_image: bool) -> PageContent {
        PageContent {
            page_number: n,
            text: text.into(),
            image: with_image.then(|| DynamicImage::ImageRgb8(RgbImage::new(2, 2))),
            width: 2,
            height: 2,
        }
    }

    #[test]
    fn page_text_is_joined_with_headers() {
        let pages = vec![page(1, "alpha", true), page(2, "beta", false)];
        assert_eq!(
            join_page_text(&pages),
            "--- Page 1 ---\nalpha\n\n--- Page 2 ---\nbeta"
        );
    }

    #[test]
    fn images_skip_unrendered_pages() {
        let pages = vec![page(1, "", false), page(2, "", true)];
        let doc = ProcessedDocument {
            kind: DocumentKind::Pdf,
            path: PathBuf::from("x.pdf"),
            text_content: join_page_text(&pages),
            pages,
            metadata: DocumentMetadata::default(),
        };
        let numbers: Vec<usize> = doc.images().map(|(n, _)| n).collect();
        assert_eq!(numbers, vec![2]);
        assert!(doc.has_images());
    }

    #[tokio::test]
    async fn image_file_becomes_single_page() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("scan.png");
        DynamicImage::ImageRgb8(RgbImage::from_pixel(12, 8, Rgb([0, 128, 255])))
            .save(&file)
            .unwrap();

        let doc = load_document(&file, DocumentKind::Image, &ExtractionConfig::default())
            .await
            .unwrap();
        assert_eq!(doc.pages.len(), 1);
        assert_eq!((doc.pages[0].width, doc.pages[0].height), (12, 8));
        assert!(doc.text_content.is_empty());
        assert_eq!(doc.metadata.image_format.as_deref(), Some("Png"));
        assert_eq!(doc.metadata.page_count, 1);
    }

    #[tokio::test]
    async fn garbage_image_reports_decode_failure() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("broken.jpg");
        std::fs::write(&file, b"not really a jpeg").unwrap();
        let err = load_document(&file, DocumentKind::Image, &ExtractionConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractError::ImageDecodeFailed { .. }));
    }
}
