//! Tesseract recognition engine.

use std::{ffi::OsString, sync::Arc};

use clap::Args;
use image::ImageFormat;
use tokio::process::Command;

use super::{
    EngineFactory, TextDetector,
    models::{DEFAULT_MODEL_BASE_URL, ModelStore},
};
use crate::{
    async_utils::check_for_command_failure,
    languages::LanguageSet,
    ocr::detection::{Detection, Region},
    page_iter::Page,
    prelude::*,
};

/// TSV rows at this level describe single words.
const WORD_LEVEL: u32 = 5;

/// First column of the TSV header line.
const TSV_HEADER_START: &str = "level\t";

/// Options for the recognition engine.
#[derive(Args, Clone, Debug)]
pub struct EngineOptions {
    /// Directory holding recognition models. Missing models are downloaded
    /// here on first use.
    #[clap(long, env = "SCAN_TEXT_MODEL_DIR", default_value = "models/tessdata")]
    pub model_dir: PathBuf,

    /// Never download models; fail if one is missing.
    #[clap(long)]
    pub no_download: bool,

    /// Base URL to download models from.
    #[clap(long, env = "SCAN_TEXT_MODEL_BASE_URL", default_value = DEFAULT_MODEL_BASE_URL)]
    pub model_base_url: String,
}

/// Starts [`TesseractEngine`]s, fetching models first if needed.
pub struct TesseractFactory {
    store: ModelStore,
}

impl TesseractFactory {
    pub fn new(options: &EngineOptions) -> Self {
        Self {
            store: ModelStore::new(
                options.model_dir.clone(),
                options.model_base_url.clone(),
                !options.no_download,
            ),
        }
    }
}

#[async_trait]
impl EngineFactory for TesseractFactory {
    async fn create(&self, languages: &LanguageSet) -> Result<Arc<dyn TextDetector>> {
        let models = languages.tesseract_models();
        self.store.ensure_models(&models).await?;
        Ok(Arc::new(TesseractEngine {
            tessdata_dir: self.store.dir().to_owned(),
            models: models.join("+"),
        }))
    }
}

/// Recognition engine wrapping the `tesseract` CLI tool.
pub struct TesseractEngine {
    /// Where our `.traineddata` files live.
    tessdata_dir: PathBuf,
    /// Models to load, in Tesseract's `eng+fra` syntax.
    models: String,
}

#[async_trait]
impl TextDetector for TesseractEngine {
    #[instrument(level = "debug", skip_all, fields(page = page.index, models = %self.models))]
    async fn detect(&self, page: &Page) -> Result<Vec<Detection>> {
        // Write our input to a temporary file.
        let tmpdir = tempfile::TempDir::with_prefix("tesseract")?;
        let input_path = tmpdir.path().join("page.png");
        page.image
            .save_with_format(&input_path, ImageFormat::Png)
            .context("cannot write tesseract input file")?;

        let output = Command::new("tesseract")
            .args(self.args(&input_path))
            .output()
            .await
            .context("cannot run tesseract")?;
        check_for_command_failure("tesseract", &output, None)?;

        let tsv = String::from_utf8(output.stdout)
            .context("tesseract output was not valid UTF-8")?;
        parse_tsv(&tsv)
    }
}

impl TesseractEngine {
    /// Command-line arguments to recognize `input_path`, writing word boxes
    /// as TSV to stdout.
    ///
    /// TSV output is switched on with a variable rather than the stock `tsv`
    /// config file, because Tesseract only looks for config files under the
    /// tessdata directory and ours holds nothing but models.
    fn args(&self, input_path: &Path) -> Vec<OsString> {
        vec![
            input_path.into(),
            "stdout".into(),
            "--tessdata-dir".into(),
            self.tessdata_dir.clone().into(),
            "-l".into(),
            self.models.clone().into(),
            "-c".into(),
            "tessedit_create_tsv=1".into(),
        ]
    }
}

/// Parse Tesseract's TSV output into word detections.
///
/// Columns are `level page_num block_num par_num line_num word_num left top
/// width height conf text`. Only word rows with text are kept.
fn parse_tsv(tsv: &str) -> Result<Vec<Detection>> {
    if let Some(header) = tsv.lines().next()
        && !header.trim().is_empty()
        && !header.starts_with(TSV_HEADER_START)
    {
        return Err(anyhow!(
            "tesseract did not write TSV output, first line was {:?}",
            header
        ));
    }
    let mut detections = vec![];
    for (line_idx, line) in tsv.lines().enumerate().skip(1) {
        if line.trim().is_empty() {
            continue;
        }
        let fields = line.splitn(12, '\t').collect::<Vec<_>>();
        if fields.len() < 11 {
            return Err(anyhow!(
                "tesseract TSV line {} has {} columns: {:?}",
                line_idx + 1,
                fields.len(),
                line
            ));
        }
        let number = |col: usize| -> Result<f64> {
            fields[col].trim().parse::<f64>().with_context(|| {
                format!(
                    "bad value {:?} in column {} of tesseract TSV line {}",
                    fields[col],
                    col + 1,
                    line_idx + 1
                )
            })
        };

        let level = number(0)?;
        let text = fields.get(11).copied().unwrap_or_default();
        if level != f64::from(WORD_LEVEL) || text.trim().is_empty() {
            continue;
        }
        let region = Region::from_rect(number(6)?, number(7)?, number(8)?, number(9)?);
        let confidence = (number(10)? / 100.0).clamp(0.0, 1.0) as f32;
        detections.push(Detection::new(region, text, confidence));
    }
    trace!(count = detections.len(), "Parsed tesseract TSV");
    Ok(detections)
}
