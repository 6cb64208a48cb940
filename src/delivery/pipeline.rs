use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use tokio::io::AsyncWriteExt;
use tracing::info;

use super::template::{render, OBSERVER_SCRIPT_SLOT};

async fn read_source(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))
}

/// Read the loader template and the observer payload concurrently and
/// insert the payload at the observer slot.
pub async fn build_document(template: &Path, payload: &Path) -> Result<String> {
    let (template_source, payload_source) =
        tokio::try_join!(read_source(template), read_source(payload))?;

    let insertions = HashMap::from([(OBSERVER_SCRIPT_SLOT.to_string(), payload_source)]);
    let document = render(&template_source, &insertions)
        .with_context(|| format!("failed to render {}", template.display()))?;

    info!(template = %template.display(), bytes = document.len(), "delivery document built");
    Ok(document)
}

/// Write the document to `output`, or to stdout when none is given.
pub async fn write_document(document: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => tokio::fs::write(path, document)
            .await
            .with_context(|| format!("failed to write {}", path.display())),
        None => {
            let mut stdout = tokio::io::stdout();
            stdout.write_all(document.as_bytes()).await?;
            stdout.flush().await?;
            Ok(())
        }
    }
}
