//! Templar CLI - resolve and inspect templated configuration files

use std::fs;
use std::path::Path;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use colored::Colorize;
use serde_json::Value;

use templar::context::{ConfigContext, GenericContext, LayeredContext};
use templar::error::{FixSuggestion, Result, TemplarError};
use templar::references::{collect_template_references, get_action_template_references};
use templar::secrets::{throw_on_missing_secret_keys, NamedConfig};
use templar::structure::resolve_template_struct;
use templar::TemplarConfig;

#[derive(Parser)]
#[command(name = "templar")]
#[command(about = "Templar - resolve ${...} templates in configuration files")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve every template in a config file and print the result as YAML
    Resolve {
        /// Path to a YAML or JSON config file
        file: String,

        /// Context file(s); earlier files take precedence
        #[arg(short, long = "context")]
        context: Vec<String>,

        /// Leave unresolvable templates in place
        #[arg(long)]
        partial: bool,

        /// Turn $${...} escapes into ${...}
        #[arg(long)]
        unescape: bool,
    },

    /// List the key paths referenced by templates in a config file
    Refs {
        /// Path to a YAML or JSON config file
        file: String,

        /// List action/runtime references instead of raw paths
        #[arg(long)]
        actions: bool,
    },

    /// Check that every referenced secret is loaded
    Secrets {
        /// Path to a YAML or JSON file; each top-level entry is one config
        file: String,

        /// Name of a loaded secret (repeatable)
        #[arg(short, long = "secret")]
        secret: Vec<String>,

        /// Label used for each config in the report
        #[arg(long, default_value = "Config")]
        label: String,
    },
}

fn main() {
    // Load .env file (ignore if not present)
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Resolve {
            file,
            context,
            partial,
            unescape,
        } => resolve(&file, &context, partial, unescape),
        Commands::Refs { file, actions } => refs(&file, actions),
        Commands::Secrets {
            file,
            secret,
            label,
        } => secrets(&file, secret, &label),
    };

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        if let Some(suggestion) = e.fix_suggestion() {
            eprintln!("  {} {}", "Fix:".yellow(), suggestion);
        }
        std::process::exit(1);
    }
}

/// Read a YAML (or JSON, a YAML subset) file into a value
fn read_value(path: &str) -> Result<Value> {
    let text = fs::read_to_string(Path::new(path))?;
    Ok(serde_yaml::from_str(&text)?)
}

fn resolve(file: &str, context_files: &[String], partial: bool, unescape: bool) -> Result<()> {
    let config = TemplarConfig::load()?.with_env();
    let opts = config.resolve_options(partial, unescape);

    let mut context = LayeredContext::new();
    for path in context_files {
        let layer: Arc<dyn ConfigContext> = Arc::new(GenericContext::new(read_value(path)?));
        context = context.with_layer(layer);
    }

    let value = read_value(file)?;
    let resolved = resolve_template_struct(&value, &context, &opts)?;
    print!("{}", serde_yaml::to_string(&resolved)?);
    Ok(())
}

fn refs(file: &str, actions: bool) -> Result<()> {
    let value = read_value(file)?;

    if actions {
        for reference in get_action_template_references(&value, None)? {
            println!(
                "{} {} {}",
                reference.kind.to_string().cyan().bold(),
                reference.name,
                reference.full_ref.join(".").dimmed()
            );
        }
    } else {
        for path in collect_template_references(&value)? {
            println!("{}", path.join("."));
        }
    }
    Ok(())
}

fn secrets(file: &str, extra: Vec<String>, label: &str) -> Result<()> {
    let config = TemplarConfig::load()?;
    let loaded = config.loaded_secrets(extra);

    let value = read_value(file)?;
    let Value::Object(entries) = &value else {
        return Err(TemplarError::ConfigError {
            reason: format!("{} must contain a mapping of named configs", file),
        });
    };

    let configs: Vec<NamedConfig<'_>> = entries
        .iter()
        .map(|(name, config)| NamedConfig::new(name, config))
        .collect();

    throw_on_missing_secret_keys(&configs, &loaded, label)?;
    println!(
        "{} all referenced secrets are loaded ({} configs checked)",
        "✓".green(),
        configs.len()
    );
    Ok(())
}
