//! The `languages` subcommand.

use tokio::io::AsyncWriteExt as _;

use crate::{languages::KNOWN_LANGUAGES, prelude::*};

/// List the language codes we offer, with the model behind each.
pub async fn cmd_languages() -> Result<()> {
    let mut listing = String::new();
    for (code, model) in KNOWN_LANGUAGES {
        listing.push_str(&format!("{code:<8}{model}\n"));
    }
    let mut stdout = tokio::io::stdout();
    stdout
        .write_all(listing.as_bytes())
        .await
        .context("Failed to write output")?;
    stdout.flush().await.context("Failed to flush output")?;
    Ok(())
}
