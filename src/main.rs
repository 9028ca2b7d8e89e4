use std::fs::OpenOptions;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cinecrawl::app::AppContext;
use cinecrawl::cli::{commands, Cli, Commands};
use cinecrawl::config::{Config, Environment};

fn init_tracing(log_file: Option<&Path>) -> anyhow::Result<()> {
    let file_layer = match log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            Some(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(file_layer)
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    Ok(())
}

/// Clear `running` on SIGINT/SIGTERM so no new batch or movie is started
fn spawn_shutdown_listener(running: Arc<AtomicBool>) {
    #[cfg(unix)]
    tokio::spawn(async move {
        use tokio::signal::unix::{signal, SignalKind};

        let (mut sigterm, mut sigint) =
            match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
                (Ok(term), Ok(int)) => (term, int),
                (Err(e), _) | (_, Err(e)) => {
                    warn!("Could not install signal handlers: {}", e);
                    return;
                }
            };

        tokio::select! {
            _ = sigterm.recv() => {},
            _ = sigint.recv() => {},
        }
        info!("Shutdown requested, finishing work in progress");
        running.store(false, Ordering::SeqCst);
    });

    #[cfg(windows)]
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        info!("Shutdown requested, finishing work in progress");
        running.store(false, Ordering::SeqCst);
    });
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_tracing(cli.log_file.as_deref())?;

    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    if let Some(workers) = cli.workers {
        config.pipeline.workers = workers;
    }

    let environment = Environment::from_env()?;
    let ctx = AppContext::new(config, environment)?;
    spawn_shutdown_listener(ctx.running.clone());

    match cli.command {
        Commands::Discover {
            range,
            limit,
            output,
        } => {
            commands::discover(&ctx, &range, limit, &output).await?;
        }
        Commands::Reviews { input, output } => {
            commands::reviews(&ctx, &input, &output).await?;
        }
        Commands::Run {
            range,
            limit,
            input,
            staging,
        } => {
            commands::run(&ctx, &range, limit, input.as_deref(), staging.as_deref()).await?;
        }
        Commands::Popular { source } => {
            commands::popular(&ctx, source).await?;
        }
        Commands::Genres => {
            commands::genres(&ctx).await?;
        }
    }

    Ok(())
}
