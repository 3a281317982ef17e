//! Lingo - configuration engine CLI
//!
//! Usage:
//!   lingo list                 # List configuration documents
//!   lingo show                 # Show the active configuration
//!   lingo validate <file>      # Validate a document file
//!   lingo export               # Export the active configuration
//!   lingo import <file>        # Import a document
//!   lingo watch                # Follow external edits

use std::path::PathBuf;
use std::sync::mpsc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lingo_core::prelude::*;
use lingo_core::validate;

#[derive(Parser)]
#[command(name = "lingo")]
#[command(about = "AI-translation configuration engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List configuration documents in the active storage directory
    List,

    /// Show the actions and providers of a configuration
    Show {
        /// Configuration name (defaults to the active one)
        name: Option<String>,
    },

    /// Validate a document file and print every finding
    Validate {
        /// Path to a configuration document
        file: PathBuf,
    },

    /// Export the active configuration as JSON
    Export {
        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Import a document and make it the active configuration
    Import {
        /// Path to a configuration document
        file: PathBuf,

        /// Name to store it under (defaults to the file stem)
        #[arg(long)]
        name: Option<String>,
    },

    /// Switch to another configuration
    Switch {
        /// Configuration name
        name: String,
    },

    /// Duplicate a configuration under a collision-free name
    Duplicate {
        /// Configuration name
        name: String,
    },

    /// Change the preferred target language and refresh managed prompts
    SetLanguage {
        /// Language display name, e.g. "Japanese"
        language: String,
    },

    /// Watch the active configuration for external edits
    Watch,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            tracing_subscriber::EnvFilter::new("warn")
        }))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { file } => validate_file(&file),
        command => with_store(command),
    }
}

fn preferences_path() -> Result<PathBuf> {
    let dir = dirs::config_dir().context("Could not determine config directory")?;
    Ok(dir.join("lingo").join("preferences.toml"))
}

fn with_store(command: Commands) -> Result<()> {
    let prefs = FilePreferences::load_or_default(preferences_path()?);
    let (events, receiver) = mpsc::channel();
    let mut store = ConfigStore::start(Box::new(prefs), events)?;

    match command {
        Commands::List => {
            for info in store.files().list()? {
                let marker = if info.name == store.current_name() { "*" } else { " " };
                println!("{marker} {:<24} {}", info.name, info.modified.to_rfc3339());
            }
        }
        Commands::Show { name } => {
            if let Some(name) = name
                && name != store.current_name()
            {
                store.switch_configuration(&name)?;
            }
            print_store(&store);
        }
        Commands::Export { output } => {
            let bytes = store.export_current()?;
            match output {
                Some(path) => {
                    std::fs::write(&path, bytes)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    println!("Exported to {}", path.display());
                }
                None => println!("{}", String::from_utf8_lossy(&bytes)),
            }
        }
        Commands::Import { file, name } => {
            let bytes = std::fs::read(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let name = name.unwrap_or_else(|| {
                file.file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "Imported".to_string())
            });
            let result = store.import_document(&bytes, &name)?;
            for issue in result.warnings() {
                println!("warning: {issue}");
            }
            println!("Imported as `{name}`");
        }
        Commands::Switch { name } => {
            store.switch_configuration(&name)?;
            println!("Switched to `{name}`");
        }
        Commands::Duplicate { name } => {
            let path = store.files().path_for(&name);
            let copy = store.files().duplicate(&path)?;
            println!("Duplicated `{name}` as `{copy}`");
        }
        Commands::SetLanguage { language } => {
            store.set_target_language(&language)?;
            println!("Target language set to {language}");
        }
        Commands::Watch => {
            println!(
                "Watching `{}` in {} — press Ctrl-C to stop",
                store.current_name(),
                store.files().dir().display()
            );
            let updates = store.subscribe();
            let pump = EventPump::new(receiver);
            loop {
                if !pump.run_once(&mut store) {
                    break;
                }
                while let Ok(event) = updates.try_recv() {
                    match event {
                        StoreEvent::Reloaded => println!("reloaded from disk"),
                        StoreEvent::Switched { name } => println!("switched to `{name}`"),
                        StoreEvent::Updated => {}
                    }
                }
            }
        }
        Commands::Validate { .. } => unreachable!("handled before store construction"),
    }

    Ok(())
}

fn validate_file(file: &PathBuf) -> Result<()> {
    let bytes =
        std::fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;
    let document = ConfigDocument::from_slice(&bytes)
        .with_context(|| format!("Failed to parse {}", file.display()))?;

    let result = validate::validate_document(&document);
    if result.is_clean() {
        println!("OK: no issues found");
        return Ok(());
    }
    for issue in &result.issues {
        let severity = match issue.severity() {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        println!("{severity}: {issue}");
    }
    if result.has_errors() {
        anyhow::bail!("{} blocking issue(s) found", result.errors().count());
    }
    Ok(())
}

fn print_store(store: &ConfigStore) {
    println!("Configuration: {}", store.current_name());
    println!("Target language: {}", store.target_language());
    println!();
    println!("Actions:");
    for action in store.actions() {
        let scenes: Vec<&str> = action.scenes.iter().map(UsageScene::as_str).collect();
        println!(
            "  {:<24} [{}] ({})",
            action.name,
            action.output_type.as_str(),
            scenes.join(", ")
        );
    }
    println!();
    println!("Providers:");
    for provider in store.providers() {
        println!(
            "  {:<24} {:<14} {} deployment(s), {} enabled",
            provider.name,
            provider.category.as_str(),
            provider.deployments.len(),
            provider.enabled_deployments.len()
        );
    }
    let validation = store.validation();
    if !validation.is_clean() {
        println!();
        println!("Findings:");
        for issue in &validation.issues {
            println!("  {issue}");
        }
    }
}
