//! Operation catalog and invocation CLI.
//!
//! Thin surface over the library: agents reach operations through the
//! registry API; this binary exists for catalog inspection and manual
//! invocation during development.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use serde_json::Value;

use actuator::config::{ActuatorConfig, load_config, write_config};
use actuator::core::context::ExecContext;
use actuator::core::registry::global;
use actuator::io::process::SystemRunner;
use actuator::logging;
use actuator::ops;

#[derive(Parser)]
#[command(name = "actuator", version, about = "Agent action-execution layer")]
struct Cli {
    /// Path to the configuration file.
    #[arg(long, default_value = "actuator.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the operation catalog as JSON.
    Catalog,
    /// Write a default actuator.toml.
    InitConfig {
        /// Overwrite an existing file.
        #[arg(short, long)]
        force: bool,
    },
    /// Execute one operation and print its result envelope.
    Invoke {
        /// Operation name from the catalog.
        tool: String,
        /// JSON object of arguments.
        #[arg(long, default_value = "{}")]
        args: String,
        /// Override the configured workspace root.
        #[arg(long)]
        workspace: Option<PathBuf>,
    },
}

fn main() {
    logging::init();
    if let Err(err) = run() {
        eprintln!("{:#}", err);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Catalog => cmd_catalog(),
        Command::InitConfig { force } => cmd_init_config(&cli.config, force),
        Command::Invoke {
            tool,
            args,
            workspace,
        } => cmd_invoke(&cli.config, &tool, &args, workspace),
    }
}

fn cmd_catalog() -> Result<()> {
    ops::install()?;
    let definitions = global().definitions();
    println!("{}", serde_json::to_string_pretty(&definitions)?);
    Ok(())
}

fn cmd_init_config(path: &PathBuf, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    write_config(path, &ActuatorConfig::default())?;
    Ok(())
}

fn cmd_invoke(
    config_path: &PathBuf,
    tool: &str,
    args: &str,
    workspace: Option<PathBuf>,
) -> Result<()> {
    let mut config = load_config(config_path)?;
    if let Some(root) = workspace {
        config.workspace_root = root;
    }

    let parsed: Value = serde_json::from_str(args).context("parse --args json")?;
    let Value::Object(arg_map) = parsed else {
        bail!("--args must be a JSON object");
    };

    ops::install()?;
    let ctx = ExecContext::new(&config, Arc::new(SystemRunner));
    let result = global().invoke(tool, &ctx, &arg_map)?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    if !result.success {
        std::process::exit(1);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_catalog() {
        let cli = Cli::parse_from(["actuator", "catalog"]);
        assert!(matches!(cli.command, Command::Catalog));
    }

    #[test]
    fn parse_invoke_with_args() {
        let cli = Cli::parse_from([
            "actuator",
            "invoke",
            "workspace_diff",
            "--args",
            r#"{"max_lines": 10}"#,
        ]);
        match cli.command {
            Command::Invoke { tool, args, .. } => {
                assert_eq!(tool, "workspace_diff");
                assert!(args.contains("max_lines"));
            }
            _ => panic!("expected invoke"),
        }
    }

    #[test]
    fn parse_init_config_force() {
        let cli = Cli::parse_from(["actuator", "init-config", "--force"]);
        assert!(matches!(cli.command, Command::InitConfig { force: true }));
    }
}
