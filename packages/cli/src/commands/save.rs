use anyhow::{Context, Result};
use colored::Colorize;
use docksock::DockerConfig;
use futures_util::StreamExt;
use indicatif::ProgressBar;
use std::path::Path;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

/// Save an image to a tar archive
pub async fn run(config: &DockerConfig, image: &str, output: &Path) -> Result<()> {
    let socket = super::connect(config).await?;
    let mut archive = socket.images().export(image).await?;

    let mut file = File::create(output)
        .await
        .with_context(|| format!("Failed to create {}", output.display()))?;

    let progress = ProgressBar::new_spinner();
    let mut written = 0u64;
    while let Some(chunk) = archive.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
        progress.set_message(format!("Saving {} ({} bytes)", image, written));
        progress.tick();
    }
    file.flush().await?;

    progress.finish_with_message(format!(
        "{} Saved {} to {} ({} bytes)",
        "✓".green().bold(),
        image,
        output.display(),
        written
    ));
    Ok(())
}
