//! Turning scanned documents into text.

pub mod batch;
pub mod detection;
pub mod engines;
pub mod errors;
pub mod lines;

use std::sync::Arc;

use self::{
    engines::EngineSession,
    errors::ProcessingError,
    lines::{LineSpacing, reconstruct_page_text},
};
use crate::{
    languages::LanguageSet,
    page_iter::{FileKind, PageIter, RasterizeOptions},
    prelude::*,
};

/// Separator between the text of consecutive pages.
const PAGE_SEPARATOR: &str = "\n\n";

/// Extracts the text of one file at a time, page by page.
pub struct DocumentWalker {
    session: Arc<EngineSession>,
    rasterize: RasterizeOptions,
    spacing: LineSpacing,
}

impl DocumentWalker {
    pub fn new(
        session: Arc<EngineSession>,
        rasterize: RasterizeOptions,
        spacing: LineSpacing,
    ) -> Self {
        Self {
            session,
            rasterize,
            spacing,
        }
    }

    /// Extract the text of an image or PDF.
    ///
    /// Pages without any text are left out. Returns an empty string if no
    /// page had text.
    #[instrument(level = "debug", skip_all, fields(path = %path.display()))]
    pub async fn extract_text(
        &self,
        path: &Path,
        languages: Option<&LanguageSet>,
    ) -> Result<String, ProcessingError> {
        let is_pdf = match FileKind::from_path(path) {
            FileKind::Unsupported(ext) => {
                return Err(ProcessingError::UnsupportedFileKind(ext));
            }
            FileKind::SingleImage => false,
            FileKind::MultiPageDocument => true,
        };

        let engine = self
            .session
            .acquire(languages)
            .await
            .map_err(ProcessingError::EngineFailure)?;

        let mut pages = if is_pdf {
            PageIter::from_pdf(path, &self.rasterize)
                .await
                .map_err(ProcessingError::RenderFailure)?
        } else {
            PageIter::from_image(path)
        };
        for warning in pages.warnings() {
            warn!(path = %path.display(), "{}", warning);
        }

        let mut page_texts = vec![];
        while let Some(page) = pages.next_page().await {
            let page = page.map_err(ProcessingError::RenderFailure)?;
            let detections = engine
                .detect(&page)
                .await
                .with_context(|| format!("recognition failed on page {}", page.index + 1))
                .map_err(ProcessingError::EngineFailure)?;
            let text = reconstruct_page_text(&detections, &self.spacing);
            debug!(
                page = page.index,
                detections = detections.len(),
                lines = text.lines().count(),
                "Recognized page"
            );
            page_texts.push(text);
        }
        Ok(join_pages(page_texts))
    }
}

/// Join page texts, skipping pages that had no text.
fn join_pages(page_texts: impl IntoIterator<Item = String>) -> String {
    page_texts
        .into_iter()
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join(PAGE_SEPARATOR)
}
