use anyhow::Result;
use colored::Colorize;
use docksock::DockerConfig;
use serde_json::Value;

const FIELDS: &[(&str, &str)] = &[
    ("Name", "Name"),
    ("ServerVersion", "Server version"),
    ("Containers", "Containers"),
    ("ContainersRunning", "  Running"),
    ("ContainersPaused", "  Paused"),
    ("ContainersStopped", "  Stopped"),
    ("Images", "Images"),
    ("Driver", "Storage driver"),
    ("OperatingSystem", "Operating system"),
    ("KernelVersion", "Kernel version"),
    ("NCPU", "CPUs"),
    ("MemTotal", "Total memory"),
];

/// Show daemon-wide information
pub async fn run(config: &DockerConfig) -> Result<()> {
    let socket = super::connect(config).await?;
    let info = socket.info().await?;

    println!("{}", "Daemon".bold());
    for (key, label) in FIELDS {
        let value = match info.get(*key) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => continue,
            Some(other) => other.to_string(),
        };
        println!("  {:<18} {}", format!("{}:", label).dimmed(), value);
    }

    Ok(())
}
