use anyhow::Result;
use colored::Colorize;
use docksock::DockerConfig;

/// Show client and daemon versions
pub async fn run(config: &DockerConfig) -> Result<()> {
    println!("{}", "Client".bold());
    println!("  {:<16} {}", "Version:".dimmed(), env!("CARGO_PKG_VERSION"));
    println!("  {:<16} {}", "Socket:".dimmed(), config.socket_path.display());
    println!();

    let socket = super::connect(config).await?;
    let version = socket.version()?;
    let unknown = "-".to_string();

    println!("{}", "Server".bold());
    println!(
        "  {:<16} {}",
        "Version:".dimmed(),
        version.version.as_ref().unwrap_or(&unknown)
    );
    println!("  {:<16} {}", "API version:".dimmed(), version.api_version);
    println!(
        "  {:<16} {}",
        "Min API version:".dimmed(),
        version.min_api_version.as_ref().unwrap_or(&unknown)
    );
    println!(
        "  {:<16} {}",
        "Go version:".dimmed(),
        version.go_version.as_ref().unwrap_or(&unknown)
    );
    println!(
        "  {:<16} {}/{}",
        "OS/Arch:".dimmed(),
        version.os.as_ref().unwrap_or(&unknown),
        version.arch.as_ref().unwrap_or(&unknown)
    );
    println!(
        "  {:<16} {}",
        "Resolved socket:".dimmed(),
        socket.socket_path().display()
    );

    Ok(())
}
