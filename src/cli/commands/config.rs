//! Config Command
//!
//! Usage:
//!   brandpulse config show [-f json]
//!   brandpulse config path
//!   brandpulse config init [-g] [--force]

use std::path::Path;

use crate::cli::ui::Output;
use crate::cli::util::{CommandContext, OutputFormat};
use crate::config::ConfigLoader;
use crate::types::Result;

/// Show the merged effective configuration. Secrets are never printed.
pub fn show(config_path: Option<&Path>, format: OutputFormat) -> Result<()> {
    let ctx = CommandContext::load(config_path)?;
    match format {
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(&ctx.config)?),
        OutputFormat::Json => println!("{}", ConfigLoader::render(&ctx.config, true)?),
        OutputFormat::Text => println!("{}", ConfigLoader::render(&ctx.config, false)?),
    }
    Ok(())
}

pub fn path() -> Result<()> {
    ConfigLoader::show_path();
    Ok(())
}

pub fn init(global: bool, force: bool) -> Result<()> {
    let path = ConfigLoader::init(global, force)?;
    let scope = if global { "global" } else { "project" };
    Output::new().success(&format!("Initialized {} configuration", scope));
    println!("  Config: {}", path.display());
    Ok(())
}
