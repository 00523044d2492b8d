use anyhow::{bail, Result};
use colored::Colorize;
use dialoguer::Password;
use docksock::{ApiError, DockerConfig, RegistryCredential};

/// Handle the login command
pub async fn run(config: &DockerConfig, server: &str, username: &str) -> Result<()> {
    println!("{} {}", "Registry Login:".bold(), server);
    println!();

    let password: String = Password::new()
        .with_prompt(format!("Password for {}", username))
        .interact()?;

    if password.is_empty() {
        bail!("Password cannot be empty");
    }

    let socket = super::connect(config).await?;
    let credential = RegistryCredential::new(server, username, password);

    match socket.authenticate(&credential).await {
        Ok(_) => {
            println!();
            println!("{} Login Succeeded", "✓".green().bold());
            Ok(())
        }
        Err(ApiError::InvalidCredentials) => {
            bail!("Invalid credentials for {} at {}", username, server)
        }
        Err(e) => Err(e.into()),
    }
}
