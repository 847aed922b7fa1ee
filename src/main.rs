//! mailkiln - a build pipeline for source-controlled email templates.

mod build;
mod cli;
mod config;
mod context;
mod css;
mod dom;
mod error;
mod html;
mod images;
mod logger;
mod output;
mod render;
mod style;
mod template;
mod typography;

use anyhow::{Result, bail};
use build::build_all;
use clap::Parser;
use cli::{Cli, Commands};
use config::KilnConfig;
use context::BuildContext;
use std::{path::Path, sync::Arc, time::Instant};
use template::{Template, discover_templates};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    match &cli.command {
        Commands::Build { .. } => build(config, cli.only()).await,
    }
}

/// Load and validate configuration from CLI arguments
fn load_config(cli: &Cli) -> Result<KilnConfig> {
    let root = cli.root.as_deref().unwrap_or(Path::new("./"));
    let config_path = root.join(&cli.config);

    let mut config = if config_path.exists() {
        KilnConfig::from_path(&config_path)?
    } else {
        KilnConfig::default()
    };
    config.update_with_cli(cli);
    config.validate()?;

    Ok(config)
}

/// Build every discovered template, or only those named on the command line.
async fn build(config: KilnConfig, only: &[String]) -> Result<()> {
    let started = Instant::now();
    let templates = select(
        discover_templates(&config.build.templates, &config.render.extensions)?,
        only,
    )?;

    let ctx = Arc::new(BuildContext::new(config)?);
    let summary = build_all(ctx.clone(), templates).await;
    ctx.finish().await;

    log!(
        "build";
        "{} built, {} failed in {:.2?}",
        summary.built,
        summary.failed,
        started.elapsed()
    );
    if summary.failed > 0 {
        bail!("{} template(s) failed to build", summary.failed);
    }
    Ok(())
}

/// Keep only the requested templates. Unknown names are an error.
fn select(templates: Vec<Template>, only: &[String]) -> Result<Vec<Template>> {
    if only.is_empty() {
        return Ok(templates);
    }
    if let Some(unknown) = only.iter().find(|name| !templates.iter().any(|t| &t.name == *name)) {
        bail!("template `{unknown}` not found");
    }
    Ok(templates
        .into_iter()
        .filter(|t| only.contains(&t.name))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn templates(names: &[&str]) -> Vec<Template> {
        names.iter().map(|n| Template::new(Path::new("/t").join(n))).collect()
    }

    #[test]
    fn test_select_all_by_default() {
        assert_eq!(select(templates(&["a", "b"]), &[]).unwrap().len(), 2);
    }

    #[test]
    fn test_select_named() {
        let picked = select(templates(&["a", "b", "c"]), &["c".into(), "a".into()]).unwrap();
        let names: Vec<_> = picked.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["a", "c"]);
    }

    #[test]
    fn test_select_unknown() {
        assert!(select(templates(&["a"]), &["zzz".into()]).is_err());
    }
}
