use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::app::App;
use crate::config::Config;
use crate::parse::{parse_extensions, parse_substitutions};
use crate::sync::{SyncSettings, Synchronizer};
use crate::util::{StdinConfirm, init_progress, print_albums, print_summary};

/// Arguments for `handle_sync` grouped to avoid too-many-arguments lint.
#[derive(Clone, Debug, Default)]
pub struct SyncArgs {
    pub dir: PathBuf,
    pub recurse: bool,
    pub skip_confirmation: bool,
    pub dry_run: bool,
    pub concurrency: Option<usize>,
    pub substitutions: Option<String>,
    pub capitalize: bool,
    pub no_parse_year: bool,
    pub no_rewrite_dates: bool,
}

/// Merge config file values with command-line overrides.
pub fn build_settings(config: &Config, args: &SyncArgs) -> Result<SyncSettings> {
    let subs = args.substitutions.as_deref().unwrap_or(&config.name_substitutions);
    let substitutions = parse_substitutions(subs).context("bad album name substitutions")?;
    let settings = SyncSettings {
        recurse: args.recurse,
        skip_confirmation: args.skip_confirmation,
        dry_run: args.dry_run,
        max_concurrency: args.concurrency.unwrap_or(config.max_concurrency),
        extensions: config.extensions.clone(),
        substitutions,
        capitalize: args.capitalize || config.capitalize,
        parse_year: config.parse_year && !args.no_parse_year,
    };
    settings.validate()?;
    Ok(settings)
}

pub fn handle_sync(app: &App, args: SyncArgs) -> Result<()> {
    let config = app.get_config();
    let settings = build_settings(config, &args)?;
    let rewrite = config.rewrite_dates && !args.no_rewrite_dates && !args.dry_run;
    let rewriter = app.date_rewriter(rewrite)?;
    let api = app.open_library()?;
    let dir = std::fs::canonicalize(&args.dir)
        .with_context(|| format!("directory '{}' does not exist", args.dir.display()))?;

    tracing::info!(
        "[sync] start dir={} workers={} dry_run={} recurse={}",
        dir.display(),
        settings.max_concurrency,
        settings.dry_run,
        settings.recurse
    );
    let mut sync = Synchronizer::new(api, settings.clone()).with_progress(init_progress(false));
    if !settings.skip_confirmation {
        sync = sync.with_confirm(StdinConfirm);
    }
    if let Some(r) = rewriter {
        sync = sync.with_date_rewriter(r);
    }

    let result = sync.sync_base_dir(&dir);
    // print what got done even when a later directory failed
    print_summary(sync.reports(), settings.dry_run)?;
    result.with_context(|| format!("sync of {} aborted", dir.display()))?;
    Ok(())
}

pub fn handle_albums(app: &App) -> Result<()> {
    let api = app.open_library()?;
    let mut albums = api.list_albums().context("listing albums")?;
    albums.sort_by(|a, b| a.title.cmp(&b.title));
    print_albums(&albums)?;
    Ok(())
}

/// Arguments for `handle_set`; `None` leaves the stored value unchanged.
#[derive(Clone, Debug, Default)]
pub struct SetArgs {
    pub library_path: Option<PathBuf>,
    pub extensions: Option<String>,
    pub substitutions: Option<String>,
    pub concurrency: Option<usize>,
    pub capitalize: Option<bool>,
    pub parse_year: Option<bool>,
    pub rewrite_dates: Option<bool>,
}

pub fn handle_set(app: &mut App, args: SetArgs) -> Result<()> {
    let mut cfg = app.get_config().clone();
    if let Some(p) = args.library_path {
        cfg.library_path = p;
    }
    if let Some(e) = args.extensions {
        cfg.extensions = parse_extensions(&e)?;
    }
    if let Some(s) = args.substitutions {
        parse_substitutions(&s)?;
        cfg.name_substitutions = s;
    }
    if let Some(c) = args.concurrency {
        cfg.max_concurrency = c;
    }
    if let Some(c) = args.capitalize {
        cfg.capitalize = c;
    }
    if let Some(p) = args.parse_year {
        cfg.parse_year = p;
    }
    if let Some(r) = args.rewrite_dates {
        cfg.rewrite_dates = r;
    }
    cfg.validate()?;
    app.save_config(cfg)?;
    println!("Config updated: {}", app.config_path().display());
    Ok(())
}
