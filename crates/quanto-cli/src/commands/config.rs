//! Config command - manage configuration.

use std::fs;
use std::path::{Path, PathBuf};

use clap::{Args, Subcommand};
use console::style;
use serde_json::Value;

use quanto_core::ScannerConfig;
use quanto_core::models::config::{ENDPOINT_ENV, KEY_ENV};

/// Arguments for the config command.
#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigCommand,
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Show current configuration
    Show,

    /// Initialize a new configuration file
    Init(InitArgs),

    /// Get a specific configuration value
    Get {
        /// Configuration key (e.g., "batch.concurrency")
        key: String,
    },

    /// Set a configuration value
    Set {
        /// Configuration key
        key: String,
        /// New value
        value: String,
    },

    /// Show configuration file path
    Path,
}

#[derive(Args)]
struct InitArgs {
    /// Output path for configuration file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Overwrite existing file
    #[arg(long)]
    force: bool,
}

const REDACTED: &str = "********";

pub async fn run(args: ConfigArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let path = config_path
        .map(PathBuf::from)
        .unwrap_or_else(super::default_config_path);

    match args.command {
        ConfigCommand::Show => show_config(&path),
        ConfigCommand::Init(init_args) => init_config(init_args, path),
        ConfigCommand::Get { key } => get_config(&path, &key),
        ConfigCommand::Set { key, value } => set_config(&path, &key, &value),
        ConfigCommand::Path => show_path(&path),
    }
}

fn read_or_default(path: &Path) -> anyhow::Result<ScannerConfig> {
    if path.exists() {
        Ok(ScannerConfig::from_file(path)?)
    } else {
        Ok(ScannerConfig::default())
    }
}

/// Config as JSON with the subscription key masked.
fn redacted_json(config: &ScannerConfig) -> anyhow::Result<Value> {
    let mut json = serde_json::to_value(config)?;
    if let Some(key) = json.pointer_mut("/azure/key") {
        if !key.is_null() {
            *key = Value::String(REDACTED.to_string());
        }
    }
    Ok(json)
}

fn show_config(path: &Path) -> anyhow::Result<()> {
    if !path.exists() {
        println!(
            "{} No config file found, showing defaults.",
            style("ℹ").blue()
        );
    }
    let config = read_or_default(path)?;

    println!("{}", serde_json::to_string_pretty(&redacted_json(&config)?)?);
    println!();
    println!(
        "{} {} and {} override the azure section when set.",
        style("ℹ").blue(),
        ENDPOINT_ENV,
        KEY_ENV
    );

    Ok(())
}

fn init_config(args: InitArgs, path: PathBuf) -> anyhow::Result<()> {
    let output_path = args.output.unwrap_or(path);

    if output_path.exists() && !args.force {
        anyhow::bail!(
            "Config file already exists at {}. Use --force to overwrite.",
            output_path.display()
        );
    }

    if let Some(parent) = output_path.parent() {
        fs::create_dir_all(parent)?;
    }

    ScannerConfig::default().save(&output_path)?;

    println!(
        "{} Created configuration file at {}",
        style("✓").green(),
        output_path.display()
    );

    Ok(())
}

fn get_config(path: &Path, key: &str) -> anyhow::Result<()> {
    let json = redacted_json(&read_or_default(path)?)?;
    let value = lookup(&json, key)?;
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn lookup<'a>(json: &'a Value, key: &str) -> anyhow::Result<&'a Value> {
    key.split('.').try_fold(json, |current, part| {
        current
            .get(part)
            .ok_or_else(|| anyhow::anyhow!("Configuration key not found: {}", key))
    })
}

fn set_config(path: &Path, key: &str, value: &str) -> anyhow::Result<()> {
    let config = read_or_default(path)?;
    let parsed_value: Value =
        serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));

    let updated = apply(&config, key, parsed_value.clone())?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    updated.save(path)?;

    let shown = if key == "azure.key" {
        Value::String(REDACTED.to_string())
    } else {
        parsed_value
    };
    println!(
        "{} Set {} = {}",
        style("✓").green(),
        key,
        serde_json::to_string(&shown)?
    );

    Ok(())
}

/// Set `key` on a copy of `config`, rejecting unknown keys and values of
/// the wrong shape.
fn apply(config: &ScannerConfig, key: &str, value: Value) -> anyhow::Result<ScannerConfig> {
    let mut json = serde_json::to_value(config)?;
    let (parent, leaf) = match key.rsplit_once('.') {
        Some((parent, leaf)) => (Some(parent), leaf),
        None => (None, key),
    };

    let target = match parent {
        Some(parent) => parent.split('.').try_fold(&mut json, |current, part| {
            current
                .get_mut(part)
                .ok_or_else(|| anyhow::anyhow!("Configuration path not found: {}", key))
        })?,
        None => &mut json,
    };

    let Some(obj) = target.as_object_mut() else {
        anyhow::bail!("Cannot set value at non-object path");
    };
    if !obj.contains_key(leaf) {
        anyhow::bail!("Configuration key not found: {}", key);
    }
    obj.insert(leaf.to_string(), value);

    serde_json::from_value(json)
        .map_err(|e| anyhow::anyhow!("Invalid value for {}: {}", key, e))
}

fn show_path(path: &Path) -> anyhow::Result<()> {
    println!("Configuration file: {}", path.display());

    if path.exists() {
        println!("Status: {}", style("exists").green());
    } else {
        println!("Status: {}", style("not created").yellow());
        println!();
        println!("Run 'quanto config init' to create a configuration file.");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use quanto_core::FailurePolicy;

    #[test]
    fn test_apply_nested_value() {
        let config = ScannerConfig::default();
        let updated = apply(&config, "batch.retry.max_attempts", Value::from(5)).unwrap();
        assert_eq!(updated.batch.retry.max_attempts, 5);

        let updated = apply(&updated, "batch.failure_policy", Value::from("abort")).unwrap();
        assert_eq!(updated.batch.failure_policy, FailurePolicy::Abort);
        assert_eq!(updated.batch.retry.max_attempts, 5);
    }

    #[test]
    fn test_apply_unset_credential() {
        let config = ScannerConfig::default();
        let updated = apply(
            &config,
            "azure.endpoint",
            Value::from("https://example.cognitiveservices.azure.com"),
        )
        .unwrap();
        assert_eq!(
            updated.azure.endpoint.as_deref(),
            Some("https://example.cognitiveservices.azure.com")
        );
    }

    #[test]
    fn test_apply_rejects_unknown_key_and_bad_value() {
        let config = ScannerConfig::default();
        assert!(apply(&config, "batch.workers", Value::from(2)).is_err());
        assert!(apply(&config, "nothing.here", Value::from(2)).is_err());
        assert!(apply(&config, "batch.concurrency", Value::from("many")).is_err());
    }

    #[test]
    fn test_key_is_redacted() {
        let mut config = ScannerConfig::default();
        config.azure.key = Some("secret-key".to_string());
        let json = redacted_json(&config).unwrap();
        assert_eq!(lookup(&json, "azure.key").unwrap(), REDACTED);
        assert!(!json.to_string().contains("secret-key"));
    }

    #[test]
    fn test_lookup_missing_key() {
        let json = redacted_json(&ScannerConfig::default()).unwrap();
        assert_eq!(lookup(&json, "batch.concurrency").unwrap(), &Value::from(1));
        assert!(lookup(&json, "batch.nope").is_err());
    }
}
