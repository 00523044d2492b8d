use anyhow::{Context, Result};
use colored::Colorize;
use docksock::{BuildOptions, DockerConfig};
use futures_util::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::time::Duration;
use tokio_util::io::ReaderStream;

/// Build an image from a tar context archive
pub async fn run(
    config: &DockerConfig,
    context: &Path,
    tags: Vec<String>,
    dockerfile: String,
) -> Result<()> {
    let archive = tokio::fs::File::open(context)
        .await
        .with_context(|| format!("Failed to open build context {}", context.display()))?;

    let socket = super::connect(config).await?;
    let options = BuildOptions {
        dockerfile,
        tags,
        ..BuildOptions::default()
    };

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"])
            .template("{spinner:.blue} {msg}")?,
    );
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner.set_message("Sending build context");

    let mut records = socket
        .images()
        .build(ReaderStream::new(archive), &[], &options)
        .await?
        .json_lines();

    let mut image_id = None;
    while let Some(record) = records.next().await {
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                spinner.finish_with_message(format!("{} Build failed", "✗".red().bold()));
                return Err(e.into());
            }
        };

        if let Some(line) = record["stream"].as_str() {
            let line = line.trim_end();
            if !line.is_empty() {
                spinner.println(line);
                if line.starts_with("Step ") {
                    spinner.set_message(line.to_string());
                }
            }
        }
        if let Some(id) = record["aux"]["ID"].as_str() {
            image_id = Some(id.to_string());
        }
    }

    let built = image_id.as_deref().unwrap_or("image");
    spinner.finish_with_message(format!("{} Built {}", "✓".green().bold(), built));
    for tag in &options.tags {
        println!("  Tagged {}", tag.dimmed());
    }

    Ok(())
}
