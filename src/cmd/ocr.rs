//! The `ocr` subcommand.

use std::sync::Arc;

use clap::{Args, ValueEnum};

use crate::{
    async_utils::io::write_text,
    languages::LanguageSet,
    ocr::{
        DocumentWalker,
        batch::{FileRef, read_file_refs, render_json_lines, render_text, run_batch},
        engines::{
            EngineSession,
            tesseract::{EngineOptions, TesseractFactory},
        },
        lines::LineSpacing,
    },
    page_iter::RasterizeOptions,
    prelude::*,
    ui::Ui,
};

/// How to write our results.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Plain text, with a header per file when there are several.
    #[default]
    Text,
    /// One JSON object per file.
    Json,
}

/// Command-line options for the `ocr` subcommand.
#[derive(Debug, Args)]
pub struct OcrOpts {
    /// Images (PNG, JPEG, BMP, TIFF) or PDFs to read.
    pub paths: Vec<PathBuf>,

    /// A JSON Lines file of more inputs. Each line is a path string, or an
    /// object with a `name` or `path` field.
    #[clap(long)]
    pub files_from: Option<PathBuf>,

    /// Languages to recognize, as codes like `en` or `zh_sim`. May be
    /// repeated or comma-separated. Defaults to `en`.
    #[clap(short = 'l', long = "languages")]
    pub languages: Vec<String>,

    /// Output format.
    #[clap(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Output file. Defaults to standard output.
    #[clap(short = 'o', long = "out")]
    pub output_path: Option<PathBuf>,

    #[clap(flatten)]
    pub rasterize: RasterizeOptions,

    #[clap(flatten)]
    pub engine: EngineOptions,

    #[clap(flatten)]
    pub spacing: LineSpacing,
}

/// The `ocr` subcommand.
#[instrument(level = "debug", skip_all)]
pub async fn cmd_ocr(ui: Ui, opts: &OcrOpts) -> Result<()> {
    let mut refs = opts
        .paths
        .iter()
        .cloned()
        .map(FileRef::Path)
        .collect::<Vec<_>>();
    if let Some(files_from) = &opts.files_from {
        refs.extend(read_file_refs(files_from).await?);
    }
    if refs.is_empty() {
        return Err(anyhow!("no input files given"));
    }

    let languages = LanguageSet::from_requests(opts.languages.as_slice())?;
    let session = Arc::new(EngineSession::new(TesseractFactory::new(&opts.engine)));
    let walker = DocumentWalker::new(session, opts.rasterize, opts.spacing);

    let outcomes = run_batch(&ui, &walker, &refs, languages.as_ref()).await;
    let rendered = match opts.format {
        OutputFormat::Text => render_text(&outcomes),
        OutputFormat::Json => render_json_lines(&outcomes)?,
    };
    write_text(opts.output_path.as_deref(), &rendered).await
}
