//! Running many files through a [`DocumentWalker`] and reporting on them.

use serde_json::json;

use super::{
    DocumentWalker,
    errors::{ProcessingError, display_name},
};
use crate::{
    languages::LanguageSet,
    prelude::*,
    ui::Ui,
};

/// Shown in place of the text of a file where we found nothing.
pub const NO_TEXT_PLACEHOLDER: &str = "(No text detected)";

/// Separator between the reports for consecutive files.
const FILE_SEPARATOR: &str = "\n\n";

/// A reference to an input file.
///
/// In a `--files-from` file, each line is either a JSON string holding a
/// path, or an object with `name` and/or `path` fields. Other fields are
/// ignored.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum FileRef {
    Path(PathBuf),
    Record {
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        path: Option<PathBuf>,
    },
}

impl FileRef {
    /// The path this reference points at, if any. For records, `name` wins
    /// over `path`. Empty values count as missing.
    pub fn resolve(&self) -> Option<PathBuf> {
        match self {
            FileRef::Path(path) if !path.as_os_str().is_empty() => Some(path.clone()),
            FileRef::Path(_) => None,
            FileRef::Record { name, path } => name
                .as_deref()
                .filter(|name| !name.is_empty())
                .map(PathBuf::from)
                .or_else(|| {
                    path.as_ref()
                        .filter(|path| !path.as_os_str().is_empty())
                        .cloned()
                }),
        }
    }
}

/// Read file references from a JSON Lines file. Blank lines are skipped.
pub async fn read_file_refs(path: &Path) -> Result<Vec<FileRef>> {
    let data = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {:?}", path.display()))?;
    parse_file_refs(&data)
        .with_context(|| format!("failed to parse file references in {:?}", path.display()))
}

fn parse_file_refs(data: &str) -> Result<Vec<FileRef>> {
    data.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| {
            serde_json::from_str(line).with_context(|| format!("invalid JSON on line {}", idx + 1))
        })
        .collect()
}

/// What happened to one file.
#[derive(Debug)]
pub struct FileOutcome {
    pub path: PathBuf,
    pub status: FileStatus,
}

impl FileOutcome {
    /// The name we show for this file.
    pub fn name(&self) -> String {
        display_name(&self.path)
    }
}

#[derive(Debug)]
pub enum FileStatus {
    /// We read the file. The text may be empty.
    Extracted(String),
    /// Nothing exists at the path.
    Missing,
    /// We found the file but couldn't read it.
    Failed(ProcessingError),
}

/// Process each reference in order. Failures are recorded in the outcome for
/// that file and never stop the batch. References that resolve to no path are
/// dropped.
#[instrument(level = "debug", skip_all, fields(count = refs.len()))]
pub async fn run_batch(
    ui: &Ui,
    walker: &DocumentWalker,
    refs: &[FileRef],
    languages: Option<&LanguageSet>,
) -> Vec<FileOutcome> {
    let paths = refs.iter().filter_map(FileRef::resolve).collect::<Vec<_>>();
    if paths.len() < refs.len() {
        debug!(
            skipped = refs.len() - paths.len(),
            "Skipping references without a path"
        );
    }

    let progress = ui.new_file_progress(paths.len());

    let mut outcomes = Vec::with_capacity(paths.len());
    for path in paths {
        progress.start_file(&display_name(&path));
        let status = if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            warn!(path = %path.display(), "File not found");
            FileStatus::Missing
        } else {
            match walker.extract_text(&path, languages).await {
                Ok(text) => FileStatus::Extracted(text),
                Err(err) => {
                    error!(path = %path.display(), "Failed to process file: {}", err);
                    FileStatus::Failed(err)
                }
            }
        };
        outcomes.push(FileOutcome { path, status });
        progress.finish_file();
    }
    let problems = outcomes
        .iter()
        .filter(|outcome| !matches!(outcome.status, FileStatus::Extracted(_)))
        .count();
    progress.finish(problems);
    outcomes
}

/// Render outcomes as one block of text.
///
/// With more than one file, each file's text gets a `# <name>` header.
/// Problems are reported inline.
pub fn render_text(outcomes: &[FileOutcome]) -> String {
    let with_headers = outcomes.len() > 1;
    outcomes
        .iter()
        .map(|outcome| match &outcome.status {
            FileStatus::Extracted(text) => {
                let body = if text.is_empty() {
                    NO_TEXT_PLACEHOLDER
                } else {
                    text.as_str()
                };
                if with_headers {
                    format!("# {}\n{}", outcome.name(), body)
                } else {
                    body.to_owned()
                }
            }
            FileStatus::Missing => format!(
                "[warning] {}",
                ProcessingError::FileNotFound(outcome.path.clone())
            ),
            FileStatus::Failed(err) => {
                format!("[error] Failed to process {}: {}", outcome.name(), err)
            }
        })
        .collect::<Vec<_>>()
        .join(FILE_SEPARATOR)
}

/// Render outcomes as JSON Lines, one object per file.
pub fn render_json_lines(outcomes: &[FileOutcome]) -> Result<String> {
    let mut out = String::new();
    for outcome in outcomes {
        let file = outcome.path.display().to_string();
        let record = match &outcome.status {
            FileStatus::Extracted(text) => {
                json!({ "file": file, "status": "ok", "text": text })
            }
            FileStatus::Missing => json!({
                "file": file,
                "status": "missing",
                "error": ProcessingError::FileNotFound(outcome.path.clone()).to_string(),
            }),
            FileStatus::Failed(err) => {
                json!({ "file": file, "status": "failed", "error": err.to_string() })
            }
        };
        out.push_str(&serde_json::to_string(&record).context("failed to serialize output")?);
        out.push('\n');
    }
    Ok(out)
}
