use anyhow::Result;
use colored::Colorize;
use docksock::DockerConfig;
use futures_util::StreamExt;
use serde_json::Value;

/// Show resource usage of a container
pub async fn run(config: &DockerConfig, container: &str, stream: bool) -> Result<()> {
    let socket = super::connect(config).await?;

    println!(
        "  {:<12} {:>8} {:>22} {:>18}",
        "NAME".dimmed(),
        "CPU %".dimmed(),
        "MEM USAGE / LIMIT".dimmed(),
        "NET I/O".dimmed(),
    );

    if !stream {
        let sample = socket.containers().stats(container, false).await?;
        print_sample(container, &sample);
        return Ok(());
    }

    let mut samples = socket.containers().stats_stream(container).await?.json_lines();
    while let Some(sample) = samples.next().await {
        print_sample(container, &sample?);
    }

    Ok(())
}

fn print_sample(container: &str, sample: &Value) {
    let name = sample["name"]
        .as_str()
        .map(|n| n.trim_start_matches('/'))
        .unwrap_or(container);

    let memory = format!(
        "{} / {}",
        format_bytes(sample["memory_stats"]["usage"].as_u64().unwrap_or(0)),
        format_bytes(sample["memory_stats"]["limit"].as_u64().unwrap_or(0)),
    );

    let (rx, tx) = sample["networks"]
        .as_object()
        .map(|networks| {
            networks.values().fold((0, 0), |(rx, tx), net| {
                (
                    rx + net["rx_bytes"].as_u64().unwrap_or(0),
                    tx + net["tx_bytes"].as_u64().unwrap_or(0),
                )
            })
        })
        .unwrap_or((0, 0));

    println!(
        "  {:<12} {:>7.2}% {:>22} {:>18}",
        name,
        cpu_percent(sample),
        memory,
        format!("{} / {}", format_bytes(rx), format_bytes(tx)),
    );
}

/// CPU usage between the two samples carried in one stats document
fn cpu_percent(sample: &Value) -> f64 {
    let cpu = &sample["cpu_stats"];
    let pre = &sample["precpu_stats"];

    let cpu_delta = cpu["cpu_usage"]["total_usage"].as_f64().unwrap_or(0.0)
        - pre["cpu_usage"]["total_usage"].as_f64().unwrap_or(0.0);
    let system_delta = cpu["system_cpu_usage"].as_f64().unwrap_or(0.0)
        - pre["system_cpu_usage"].as_f64().unwrap_or(0.0);
    let cpus = cpu["online_cpus"].as_f64().unwrap_or(1.0);

    if cpu_delta <= 0.0 || system_delta <= 0.0 {
        return 0.0;
    }
    cpu_delta / system_delta * cpus * 100.0
}

fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{}{}", bytes, UNITS[0])
    } else {
        format!("{:.1}{}", value, UNITS[unit])
    }
}
