use anyhow::Result;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use video_analyzer::cli::{Cli, Commands, OutputFormat};
use video_analyzer::{output, utils, Config, VideoAnalyzer};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "video_analyzer=debug"
    } else {
        "video_analyzer=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Commands::Analyze {
            url,
            output,
            format,
        } => analyze(&url, output, format, cli.quiet).await,
        Commands::Info => {
            let config = Config::read().await?;
            println!("{}", config.app.app_name);
            println!("  Version: {}", env!("CARGO_PKG_VERSION"));
            println!("  Model: {}", config.generative.model);
            println!("  Temperature: {}", config.generative.temperature);
            Ok(())
        }
        Commands::Config { show } => {
            let config = Config::read().await?;
            if show {
                config.display();
            }
            println!("Configuration file: {}", Config::config_path()?.display());
            if let Err(e) = config.validate() {
                println!("  Not ready for analysis: {}", e);
            }
            Ok(())
        }
    }
}

async fn analyze(
    url: &str,
    output: Option<PathBuf>,
    format: Option<OutputFormat>,
    quiet: bool,
) -> Result<()> {
    let config = Config::load().await?;

    // Check for required external dependencies (non-fatal)
    let missing_deps = utils::check_dependencies(&config.platform.yt_dlp_path).await;
    if !missing_deps.is_empty() {
        eprintln!("Dependency check warnings:");
        for dep in missing_deps {
            eprintln!("   - {}", dep);
        }
    }

    let format = format
        .or_else(|| OutputFormat::from_name(&config.app.default_output_format))
        .unwrap_or(OutputFormat::Json);
    let analyzer = VideoAnalyzer::from_config(&config)?;

    let token = CancellationToken::new();
    let interrupt = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            interrupt.cancel();
        }
    });

    let progress = if quiet {
        ProgressBar::hidden()
    } else {
        let progress = ProgressBar::new_spinner();
        progress.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
        progress.enable_steady_tick(Duration::from_millis(120));
        progress
    };
    progress.set_message(format!("Analyzing {}", url));

    tracing::info!("Starting analysis for URL: {}", url);
    let outcome = analyzer.analyze_with_cancellation(url, token).await;
    progress.finish_and_clear();

    let analysis = match outcome {
        Ok(analysis) => analysis,
        Err(e) => {
            eprintln!("Error: Failed to analyze video: {}", e);
            std::process::exit(1);
        }
    };

    match output {
        Some(path) => {
            output::save_to_file(&analysis, &path, format).await?;
            println!("Analysis saved to: {}", path.display());
        }
        None => output::print_to_console(&analysis, format)?,
    }

    Ok(())
}
