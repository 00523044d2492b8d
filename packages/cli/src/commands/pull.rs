use anyhow::Result;
use colored::Colorize;
use docksock::{CreateImageOptions, DockerConfig};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Pull an image
pub async fn run(config: &DockerConfig, image: &str, tag: &str) -> Result<()> {
    let socket = super::connect(config).await?;

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"])
            .template("{spinner:.blue} {msg}")?,
    );
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner.set_message(format!("Pulling {}:{}", image, tag));

    let result = socket
        .images()
        .create(&CreateImageOptions::pull(image, tag), None)
        .await;

    match result {
        Ok(progress) => {
            let layers = progress
                .lines()
                .filter(|line| line.contains("Pull complete"))
                .count();
            spinner.finish_with_message(format!(
                "{} Pulled {}:{} ({} new layer(s))",
                "✓".green().bold(),
                image,
                tag,
                layers
            ));
            Ok(())
        }
        Err(e) => {
            spinner.finish_with_message(format!("{} Pull failed", "✗".red().bold()));
            Err(e.into())
        }
    }
}
