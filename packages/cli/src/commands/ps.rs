use anyhow::Result;
use colored::Colorize;
use docksock::api::models::ContainerState;
use docksock::{DockerConfig, ListContainersOptions};

/// List containers
pub async fn run(config: &DockerConfig, all: bool) -> Result<()> {
    let socket = super::connect(config).await?;

    let options = ListContainersOptions {
        all,
        ..ListContainersOptions::default()
    };
    let containers = socket.containers().list(&options).await?;

    if containers.is_empty() {
        println!("{}", "No containers found.".dimmed());
        return Ok(());
    }

    println!(
        "  {:<14} {:<24} {:<28} {:<12} {}",
        "ID".dimmed(),
        "NAME".dimmed(),
        "IMAGE".dimmed(),
        "STATE".dimmed(),
        "STATUS".dimmed(),
    );
    println!("{}", "─".repeat(96));

    for container in &containers {
        let state = container.state.to_string();
        let state_color = match container.state {
            ContainerState::Running => state.green(),
            ContainerState::Paused | ContainerState::Restarting => state.yellow(),
            ContainerState::Exited | ContainerState::Dead => state.red(),
            _ => state.dimmed(),
        };

        let id: String = container.id.chars().take(12).collect();
        println!(
            "  {:<14} {:<24} {:<28} {:<12} {}",
            id,
            container.display_name(),
            container.image,
            state_color,
            container.status.dimmed(),
        );
    }

    println!();
    println!("{} container(s)", containers.len());

    Ok(())
}
