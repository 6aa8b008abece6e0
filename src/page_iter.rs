//! Iterate over the pages of an input file as raster images.

use std::{sync::LazyLock, vec};

use clap::Args;
use image::{DynamicImage, ImageReader};
use regex::Regex;
use tokio::process::Command;

use crate::{
    async_utils::{check_for_command_failure, spawn_blocking_propagating_panics},
    prelude::*,
};

/// Extensions we load directly as a single raster image.
const SINGLE_IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "tiff", "tif"];

/// Extension of multi-page documents we render page by page.
const PDF_EXTENSION: &str = "pdf";

/// PDF user space units per inch. A PDF page "at native resolution" is
/// rendered at this DPI.
const PDF_POINTS_PER_INCH: f32 = 72.0;

/// A default error regex for checking command output.
static ERROR_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)error").expect("failed to compile regex"));

static DOWNGRADE_TO_WARNING_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)error: xref num").expect("failed to compile regex")
});

/// Does this line contain an error?
fn is_error_line(line: &str) -> bool {
    ERROR_REGEX.is_match(line) && !DOWNGRADE_TO_WARNING_REGEX.is_match(line)
}

/// How we handle an input file, based on its extension.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FileKind {
    /// One raster image, used as-is.
    SingleImage,
    /// A PDF, rendered one page at a time.
    MultiPageDocument,
    /// Anything else. Holds the lowercased extension with its leading dot,
    /// or an empty string if there was none.
    Unsupported(String),
}

impl FileKind {
    /// Classify a path by its extension, ignoring case.
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        if ext == PDF_EXTENSION {
            Self::MultiPageDocument
        } else if SINGLE_IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            Self::SingleImage
        } else if ext.is_empty() {
            Self::Unsupported(String::new())
        } else {
            Self::Unsupported(format!(".{ext}"))
        }
    }
}

/// One page, decoded and ready for recognition.
#[derive(Debug)]
pub struct Page {
    /// Zero-based page number within the input file.
    pub index: usize,
    /// The page, converted to 8-bit RGB.
    pub image: DynamicImage,
}

/// Options for rendering multi-page documents.
#[derive(Args, Clone, Copy, Debug)]
pub struct RasterizeOptions {
    /// Upscaling factor applied when rendering PDF pages. Higher values
    /// improve recognition of small print but slow everything down.
    #[clap(long, default_value_t = 2.0)]
    pub scale: f32,
}

impl Default for RasterizeOptions {
    fn default() -> Self {
        Self { scale: 2.0 }
    }
}

impl RasterizeOptions {
    /// The DPI to pass to the renderer.
    pub fn dpi(&self) -> u32 {
        (PDF_POINTS_PER_INCH * self.scale).round().max(1.0) as u32
    }
}

/// Pages of a file, loaded lazily in page order.
pub struct PageIter {
    /// An optional temporary directory, which holds rendered pages.
    ///
    /// This is released by [`Drop`].
    tmpdir: Option<tempfile::TempDir>,
    /// Files holding the pages, in page order.
    paths: vec::IntoIter<PathBuf>,
    /// Index of the next page.
    next_index: usize,
    /// Any warnings printed while rendering.
    warnings: Vec<String>,
}

impl PageIter {
    /// A single image file is a single page.
    pub fn from_image(path: &Path) -> Self {
        Self {
            tmpdir: None,
            paths: vec![path.to_owned()].into_iter(),
            next_index: 0,
            warnings: vec![],
        }
    }

    /// Render every page of a PDF to PNG using Poppler's `pdftocairo`.
    #[instrument(level = "debug", skip_all, fields(path = %path.display(), dpi = options.dpi()))]
    pub async fn from_pdf(path: &Path, options: &RasterizeOptions) -> Result<Self> {
        let tmpdir = tempfile::TempDir::with_prefix("pages")?;

        // pdftocairo appends zero-padded page numbers to this prefix, so the
        // files sort in page order.
        let out_prefix = tmpdir.path().join("page");
        let output = Command::new("pdftocairo")
            .arg("-png")
            .arg("-r")
            .arg(options.dpi().to_string())
            .arg(path)
            .arg(&out_prefix)
            .output()
            .await
            .with_context(|| format!("failed to run pdftocairo on {:?}", path.display()))?;
        check_for_command_failure("pdftocairo", &output, Some(&is_error_line))?;

        let mut paths = tmpdir
            .path()
            .read_dir()
            .with_context(|| {
                format!(
                    "failed to read temporary directory {:?}",
                    tmpdir.path().display()
                )
            })?
            .map(|entry| Ok(entry?.path()))
            .collect::<Result<Vec<_>>>()?;
        paths.sort();
        debug!(page_count = paths.len(), "Rendered PDF");

        let warnings = String::from_utf8_lossy(&output.stderr)
            .lines()
            .map(|line| line.trim().to_owned())
            .filter(|line| !line.is_empty())
            .collect();

        Ok(Self {
            tmpdir: Some(tmpdir),
            paths: paths.into_iter(),
            next_index: 0,
            warnings,
        })
    }

    /// Get any warnings that occurred while rendering the document.
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Load the next page, or return `None` once all pages have been read.
    pub async fn next_page(&mut self) -> Option<Result<Page>> {
        let path = self.paths.next()?;
        let index = self.next_index;
        self.next_index += 1;

        // Rendered pages are ours, so drop them as soon as they're decoded.
        let delete_after_load = self.tmpdir.is_some();
        let result = spawn_blocking_propagating_panics(move || -> Result<DynamicImage> {
            let image = load_raster(&path)?;
            if delete_after_load {
                std::fs::remove_file(&path)
                    .with_context(|| format!("failed to delete file {:?}", path.display()))?;
            }
            Ok(image)
        })
        .await;
        Some(result.map(|image| Page { index, image }))
    }
}

impl Drop for PageIter {
    fn drop(&mut self) {
        // Delete our temporary directory, if we have one.
        if let Some(tmpdir) = self.tmpdir.take() {
            let tmpdir_path = tmpdir.path().to_owned();
            if let Err(err) = tmpdir.close() {
                error!(
                    directory = ?tmpdir_path.display(),
                    "failed to delete temporary directory: {}",
                    err
                );
            }
        }
    }
}

/// Decode an image file into RGB, whatever its on-disk format.
fn load_raster(path: &Path) -> Result<DynamicImage> {
    let image = ImageReader::open(path)
        .with_context(|| format!("failed to open image {:?}", path.display()))?
        .with_guessed_format()
        .with_context(|| format!("failed to read image {:?}", path.display()))?
        .decode()
        .with_context(|| format!("failed to decode image {:?}", path.display()))?;
    Ok(DynamicImage::ImageRgb8(image.to_rgb8()))
}

#[cfg(test)]
pub(crate) mod tests {
    use image::{GenericImageView as _, Rgb, RgbImage};

    use super::*;

    /// Write a small PNG for tests.
    pub(crate) fn write_test_png(path: &Path) -> Result<()> {
        RgbImage::from_pixel(40, 20, Rgb([255, 255, 255]))
            .save(path)
            .with_context(|| format!("failed to write {:?}", path.display()))
    }

    /// Build a PDF with two blank 200x100pt pages.
    pub(crate) fn two_page_pdf() -> Vec<u8> {
        let objects = [
            "<< /Type /Catalog /Pages 2 0 R >>",
            "<< /Type /Pages /Kids [3 0 R 4 0 R] /Count 2 >>",
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 200 100] >>",
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 200 100] >>",
        ];
        let mut pdf = String::from("%PDF-1.4\n");
        let mut offsets = vec![];
        for (i, body) in objects.iter().enumerate() {
            offsets.push(pdf.len());
            pdf.push_str(&format!("{} 0 obj\n{}\nendobj\n", i + 1, body));
        }
        let xref_offset = pdf.len();
        pdf.push_str(&format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1));
        for offset in offsets {
            pdf.push_str(&format!("{:010} 00000 n \n", offset));
        }
        pdf.push_str(&format!(
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
            objects.len() + 1,
            xref_offset
        ));
        pdf.into_bytes()
    }

    #[test]
    fn is_error_line_works() {
        assert!(is_error_line("error: something went wrong"));
        assert!(is_error_line("ERROR: something went wrong"));
        assert!(!is_error_line("Warning: something is odd"));
        assert!(!is_error_line(
            "Internal Error: xref num 1234 not found but needed, document has changes, reconstruct aborted"
        ));
    }

    #[test]
    fn file_kind_follows_extension_ignoring_case() {
        let kind = |p: &str| FileKind::from_path(Path::new(p));
        assert_eq!(kind("scan.pdf"), FileKind::MultiPageDocument);
        assert_eq!(kind("SCAN.PDF"), FileKind::MultiPageDocument);
        for name in ["a.png", "a.JPG", "a.jpeg", "a.bmp", "a.Tiff", "a.tif"] {
            assert_eq!(kind(name), FileKind::SingleImage, "{name}");
        }
        assert_eq!(kind("x.docx"), FileKind::Unsupported(".docx".to_owned()));
        assert_eq!(kind("x.GIF"), FileKind::Unsupported(".gif".to_owned()));
        assert_eq!(kind("README"), FileKind::Unsupported(String::new()));
    }

    #[test]
    fn dpi_is_native_resolution_times_scale() {
        assert_eq!(RasterizeOptions::default().dpi(), 144);
        assert_eq!(RasterizeOptions { scale: 1.0 }.dpi(), 72);
        assert_eq!(RasterizeOptions { scale: 0.0 }.dpi(), 1);
    }

    #[tokio::test]
    async fn image_file_is_exactly_one_page() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("scan.png");
        write_test_png(&path)?;

        let mut pages = PageIter::from_image(&path);
        let page = pages.next_page().await.expect("one page")?;
        assert_eq!(page.index, 0);
        assert_eq!(page.image.dimensions(), (40, 20));
        assert!(pages.next_page().await.is_none());
        // We never delete files we didn't create.
        assert!(path.exists());
        Ok(())
    }

    #[tokio::test]
    async fn undecodable_image_is_an_error() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("broken.png");
        std::fs::write(&path, b"not really a png")?;

        let mut pages = PageIter::from_image(&path);
        assert!(pages.next_page().await.expect("one page").is_err());
        Ok(())
    }

    #[tokio::test]
    #[ignore = "Requires poppler-utils to be installed"]
    async fn pdf_pages_are_rendered_at_twice_native_size() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("two_pages.pdf");
        std::fs::write(&path, two_page_pdf())?;

        let mut pages = PageIter::from_pdf(&path, &RasterizeOptions::default()).await?;
        let mut sizes = vec![];
        while let Some(page) = pages.next_page().await {
            let page = page?;
            sizes.push((page.index, page.image.dimensions()));
        }
        assert_eq!(sizes, vec![(0, (400, 200)), (1, (400, 200))]);
        Ok(())
    }
}
