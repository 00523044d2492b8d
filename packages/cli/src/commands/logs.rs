use anyhow::Result;
use colored::Colorize;
use docksock::{DockerConfig, LogFrame, LogsOptions, StdStream, Tail};
use futures_util::StreamExt;

/// Fetch and display the logs of a container
pub async fn run(
    config: &DockerConfig,
    container: &str,
    follow: bool,
    tail: Option<usize>,
) -> Result<()> {
    let socket = super::connect(config).await?;

    let options = LogsOptions {
        tail: tail.map_or(Tail::All, Tail::Lines),
        ..LogsOptions::default()
    };

    if !follow {
        let frames = socket.containers().logs(container, &options).await?;
        if frames.is_empty() {
            println!("{}", "No logs found.".dimmed());
        }
        for frame in &frames {
            print_frame(frame);
        }
        return Ok(());
    }

    let mut frames = socket
        .containers()
        .follow_logs(container, &options)
        .await?
        .log_frames();
    while let Some(frame) = frames.next().await {
        print_frame(&frame?);
    }

    Ok(())
}

fn print_frame(frame: &LogFrame) {
    let text = frame.text();
    let text = text.trim_end_matches('\n');
    match frame.stream {
        StdStream::Stderr => eprintln!("{}", text.red()),
        _ => println!("{}", text),
    }
}
