//! Local storage for recognition models.
//!
//! Tesseract needs one `<model>.traineddata` file per language. We keep them
//! in a single directory, and fetch missing ones on demand.

use std::io::Write as _;

use crate::{async_utils::spawn_blocking_propagating_panics, prelude::*};

/// Where to fetch models from by default.
pub const DEFAULT_MODEL_BASE_URL: &str =
    "https://github.com/tesseract-ocr/tessdata_fast/raw/main";

/// A directory of model files.
#[derive(Clone, Debug)]
pub struct ModelStore {
    dir: PathBuf,
    base_url: String,
    download_enabled: bool,
}

impl ModelStore {
    pub fn new(dir: PathBuf, base_url: String, download_enabled: bool) -> Self {
        Self {
            dir,
            base_url,
            download_enabled,
        }
    }

    /// The directory holding our models.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The path where a model is (or would be) stored.
    pub fn model_path(&self, model: &str) -> PathBuf {
        self.dir.join(format!("{model}.traineddata"))
    }

    /// Make sure every model is available locally, downloading as needed.
    #[instrument(level = "debug", skip_all, fields(dir = %self.dir.display()))]
    pub async fn ensure_models(&self, models: &[&str]) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await.with_context(|| {
            format!("failed to create model directory {:?}", self.dir.display())
        })?;
        for model in models {
            let path = self.model_path(model);
            if tokio::fs::try_exists(&path).await.unwrap_or(false) {
                debug!(model, "Model already available");
                continue;
            }
            if !self.download_enabled {
                return Err(anyhow!(
                    "model {:?} is missing from {:?} and downloads are disabled",
                    model,
                    self.dir.display()
                ));
            }
            self.download(model, path).await?;
        }
        Ok(())
    }

    /// Fetch one model, writing it atomically so an interrupted download
    /// never leaves a truncated model behind.
    async fn download(&self, model: &str, path: PathBuf) -> Result<()> {
        let url = format!(
            "{}/{}.traineddata",
            self.base_url.trim_end_matches('/'),
            model
        );
        info!(model, url = %url, "Downloading recognition model");
        let bytes = reqwest::get(&url)
            .await
            .with_context(|| format!("failed to download {url}"))?
            .error_for_status()
            .with_context(|| format!("failed to download {url}"))?
            .bytes()
            .await
            .with_context(|| format!("failed to read download from {url}"))?;

        let size = bytes.len();
        let dir = self.dir.clone();
        spawn_blocking_propagating_panics(move || -> Result<()> {
            let mut tmp = tempfile::NamedTempFile::new_in(&dir)
                .context("failed to create temporary model file")?;
            tmp.write_all(&bytes)
                .context("failed to write temporary model file")?;
            tmp.persist(&path)
                .map_err(|err| err.error)
                .with_context(|| format!("failed to save model to {:?}", path.display()))?;
            Ok(())
        })
        .await?;
        info!(model, size, "Model downloaded");
        Ok(())
    }
}
