use std::path::PathBuf;

use anyhow::Result;
use clap::Subcommand;

use crate::cli::output::get_formatter;
use crate::models::{CONFIG_PATH_ENV, Config, OutputFormat};

const LOCAL_CONFIG: &str = "ragchat.toml";

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    #[command(about = "Write a configuration file with the default settings")]
    Init {
        #[arg(
            long,
            short = 'g',
            help = "Create the per-user config instead of ./ragchat.toml"
        )]
        global: bool,
        #[arg(long, help = "Force overwrite existing config")]
        force: bool,
    },
    #[command(about = "Show the effective configuration")]
    Show,
    #[command(about = "Show configuration file paths")]
    Path,
}

pub async fn handle_config(cmd: ConfigCommand, format: OutputFormat, _verbose: bool) -> Result<()> {
    match cmd {
        ConfigCommand::Init { global, force } => handle_init(global, force, format),
        ConfigCommand::Show => handle_show(format),
        ConfigCommand::Path => handle_path(format),
    }
}

fn handle_init(global: bool, force: bool, format: OutputFormat) -> Result<()> {
    let formatter = get_formatter(format);
    let path = if global {
        Config::global_path().ok_or_else(|| anyhow::anyhow!("could not determine config directory"))?
    } else {
        PathBuf::from(LOCAL_CONFIG)
    };

    if path.exists() && !force {
        anyhow::bail!(
            "Config already exists at: {}\nUse --force to overwrite.",
            path.display()
        );
    }

    Config::default().save(&path)?;
    println!(
        "{}",
        formatter.format_message(&format!("Created config at: {}", path.display()))
    );
    Ok(())
}

fn handle_show(format: OutputFormat) -> Result<()> {
    let mut config = Config::load()?;
    mask_keys(&mut config);

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    match Config::config_path() {
        Some(path) => println!("# Loaded from: {}", path.display()),
        None => println!("# No config file found; showing defaults"),
    }
    println!();
    print!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}

fn mask_keys(config: &mut Config) {
    for key in [
        &mut config.embedding.api_key,
        &mut config.generation.api_key,
        &mut config.vector_store.api_key,
    ] {
        if key.is_some() {
            *key = Some("********".to_string());
        }
    }
}

fn handle_path(format: OutputFormat) -> Result<()> {
    let active = Config::config_path();
    let env_path = std::env::var(CONFIG_PATH_ENV).ok();
    let global = Config::global_path();

    if format == OutputFormat::Json {
        let output = serde_json::json!({
            "active": active,
            "env": env_path,
            "local": LOCAL_CONFIG,
            "global": global,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("Configuration paths (first match wins):");
    println!();
    match &env_path {
        Some(path) => println!("${CONFIG_PATH_ENV}: {path}"),
        None => println!("${CONFIG_PATH_ENV}: (unset)"),
    }
    println!("Local:  {LOCAL_CONFIG}");
    if let Some(path) = &global {
        println!("Global: {}", path.display());
    }
    println!();
    match active {
        Some(path) => println!("Active: {}", path.display()),
        None => println!("Active: (none, using defaults)"),
    }
    Ok(())
}
