//! Output helpers.

use tokio::{
    fs::File,
    io::{AsyncWrite, AsyncWriteExt as _, BufWriter},
};

use crate::prelude::*;

/// Create an [`AsyncWrite`] for a file or stdout.
pub async fn create_writer(
    path: Option<&Path>,
) -> Result<Box<dyn AsyncWrite + Unpin + Send + Sync + 'static>> {
    match path {
        Some(path) => {
            let file = File::create(path)
                .await
                .with_context(|| format!("Failed to create file at path: {:?}", path))?;
            Ok(Box::new(file))
        }
        None => Ok(Box::new(tokio::io::stdout())),
    }
}

/// Write a block of text to a file or stdout, ending it with a newline.
pub async fn write_text(path: Option<&Path>, text: &str) -> Result<()> {
    let mut writer = BufWriter::new(create_writer(path).await?);
    if !text.is_empty() {
        writer
            .write_all(text.as_bytes())
            .await
            .context("Failed to write output")?;
        if !text.ends_with('\n') {
            writer
                .write_all(b"\n")
                .await
                .context("Failed to write output")?;
        }
    }
    writer.flush().await.context("Failed to flush output")?;
    Ok(())
}
