use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use leakscope_core::AppConfig;
use leakscope_scanner::Pipeline;
use leakscope_server::{cancel_on_ctrl_c, init_tracing, prepare_input_dir, serve};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

#[derive(Parser, Debug)]
#[command(name = "leakscope", version, about = "Credential leak extraction pipeline")]
struct Cli {
    #[arg(long, short, global = true, help = "Path to config.toml")]
    config: Option<PathBuf>,
    #[arg(long, global = true, help = "Print reports as JSON")]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP service and the periodic pass loop
    Serve {
        #[arg(long, help = "Override server.bind")]
        bind: Option<String>,
    },
    /// Run a single pass over the input directory and exit
    Scan {
        #[arg(long, help = "Process this text as one unit instead of the input directory")]
        text: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let mut config =
        AppConfig::load_with_env(cli.config.as_deref()).context("Failed to load configuration")?;
    tracing::info!("Starting leakscope v{}", env!("CARGO_PKG_VERSION"));

    let cancel = CancellationToken::new();
    cancel_on_ctrl_c(cancel.clone());

    match cli.command {
        Commands::Serve { bind } => {
            if let Some(bind) = bind {
                config.server.bind = bind;
            }
            serve(config, cancel).await
        }
        Commands::Scan { text } => scan(&config, text, cli.json, cancel).await,
    }
}

async fn scan(
    config: &AppConfig,
    text: Option<String>,
    json: bool,
    cancel: CancellationToken,
) -> Result<()> {
    let mut pipeline = Pipeline::from_config(config)
        .context("Failed to set up pipeline")?
        .with_cancellation(cancel);

    if let Some(text) = text {
        let unit = pipeline.process_text("inline", &text).await?;
        if json {
            println!("{}", serde_json::to_string_pretty(&unit)?);
        } else {
            println!(
                "inline: {} credential(s), {} new",
                unit.raw_creds, unit.fresh_creds
            );
        }
        return Ok(());
    }

    prepare_input_dir(config)?;
    let report = pipeline.run_pass().await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!(
            "{} input(s): {} archived, {} retained, {} credential(s) found, {} new",
            report.units.len(),
            report.archived(),
            report.retained(),
            report.raw_creds(),
            report.fresh_creds()
        );
    }
    if let Some(e) = &report.state_error {
        eprintln!("warning: alerted credential state not saved: {e}");
    }
    Ok(())
}
