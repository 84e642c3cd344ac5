use anyhow::{Context, Result};
use clap::Parser;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use photo_uploader::app::App;
use photo_uploader::cli::{Cli, Commands};
use photo_uploader::commands::{self, SetArgs, SyncArgs};
use photo_uploader::config::Config;

/// Compact stderr logs filtered by `RUST_LOG` (default `warn`). With
/// `verbose`, also a debug-level file log under `~/.photo-uploader/logs`.
fn init_tracing(verbose: bool) -> Result<Option<WorkerGuard>> {
    let stderr_layer = tracing_subscriber::fmt::layer()
        .compact()
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")));

    if !verbose {
        tracing_subscriber::registry().with(stderr_layer).init();
        return Ok(None);
    }

    let log_dir = Config::log_dir()?;
    std::fs::create_dir_all(&log_dir).with_context(|| format!("creating {}", log_dir.display()))?;
    let file_appender = tracing_appender::rolling::daily(&log_dir, "sync.log");
    let (writer, guard) = tracing_appender::non_blocking(file_appender);
    let file_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_thread_names(true)
        .with_writer(writer)
        .with_filter(EnvFilter::new("photo_uploader=debug"));
    tracing_subscriber::registry().with(stderr_layer).with(file_layer).init();
    eprintln!("verbose log: {}", log_dir.join("sync.log.<date>").display());
    Ok(Some(guard))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let verbose = matches!(cli.command, Commands::Sync { verbose: true, .. });
    // keep the guard alive so buffered file logs are flushed on exit
    let _guard = init_tracing(verbose)?;

    let mut app = App::init()?;
    match cli.command {
        Commands::Sync {
            dir,
            recurse,
            skip_confirmation,
            dry_run,
            concurrency,
            substitutions,
            capitalize,
            no_parse_year,
            no_rewrite_dates,
            verbose: _,
        } => commands::handle_sync(
            &app,
            SyncArgs {
                dir,
                recurse,
                skip_confirmation,
                dry_run,
                concurrency,
                substitutions,
                capitalize,
                no_parse_year,
                no_rewrite_dates,
            },
        ),
        Commands::Albums {} => commands::handle_albums(&app),
        Commands::Set {
            library_path,
            extensions,
            substitutions,
            concurrency,
            capitalize,
            parse_year,
            rewrite_dates,
        } => commands::handle_set(
            &mut app,
            SetArgs { library_path, extensions, substitutions, concurrency, capitalize, parse_year, rewrite_dates },
        ),
    }
}
