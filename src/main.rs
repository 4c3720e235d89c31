#![forbid(unsafe_code)]

use anyhow::{anyhow, Context, Result};
use log::{debug, warn, LevelFilter};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use vaino::actionable::{self, providers, ActionableError};
use vaino::cancel::CancellationToken;
use vaino::cli::{self, Cli, CliCommand, DeleteTarget, DiffArgs, ListTarget};
use vaino::config::{Config, ConfigError};
use vaino::constants::{EXIT_DRIFT_DETECTED, EXIT_GENERAL, EXIT_INTERRUPTED};
use vaino::differ::{DiffOptions, Differ};
use vaino::error::{Error, Phase};
use vaino::logging::{init_logging, level_for_verbosity, parse_level};
use vaino::models::{Snapshot, SnapshotInfo};
use vaino::output::{
    filter_by_severity, formatter_for, has_drift, render_to_file, Format, Formatter,
    StreamFormat, StreamRenderer,
};
use vaino::storage::{AtomicWriter, SnapshotStore};
use vaino::timeline::TimelineAnalyzer;

/// Everything a command needs once configuration is resolved
struct App {
    config: Config,
    store: SnapshotStore,
    cancel: CancellationToken,
    quiet: bool,
}

impl App {
    fn formatter(&self, format: Option<Format>) -> Result<Box<dyn Formatter>> {
        let format = match format {
            Some(format) => format,
            None => self.config.output.format.parse::<Format>()?,
        };
        Ok(formatter_for(format, &self.config.render_options()))
    }

    /// Status line on stderr, suppressed by `--quiet`
    fn status(&self, message: &str) {
        if !self.quiet {
            eprintln!("{}", message);
        }
    }
}

fn main() {
    let cli = cli::parse_args();
    let no_color = cli.global.no_color;
    let code = match run(&cli) {
        Ok(code) => code,
        Err(err) => report_error(&err, no_color),
    };
    std::process::exit(code);
}

fn run(cli: &Cli) -> Result<i32> {
    let mut config = Config::load(cli.global.config.as_deref())?;
    if cli.global.no_color {
        config.output.no_color = true;
    }
    if let Some(base_dir) = &cli.global.base_dir {
        config.storage.base_dir = base_dir.clone();
    }

    let base_level = parse_level(&config.logging.level).unwrap_or(LevelFilter::Warn);
    let level = if cli.global.quiet {
        LevelFilter::Error
    } else {
        level_for_verbosity(base_level, cli.global.verbose)
    };
    init_logging(level)?;

    let cancel = CancellationToken::new();
    if let Err(e) = cancel.register_signals() {
        warn!("could not install signal handlers: {}", e);
    }

    let store = SnapshotStore::open(config.base_dir(), config.store_options())?;
    debug!("using store {:?}", store);
    let ctx = App {
        config,
        store,
        cancel,
        quiet: cli.global.quiet,
    };

    match &cli.command {
        CliCommand::Import { files } => import(&ctx, files),
        CliCommand::List { target, format } => list(&ctx, *target, *format),
        CliCommand::Show { id, format, stream } => show(&ctx, id, *format, *stream),
        CliCommand::Baseline {
            name,
            snapshot,
            description,
        } => baseline(&ctx, name, snapshot, description),
        CliCommand::Diff(args) => diff(&ctx, args),
        CliCommand::Timeline { provider, format } => timeline(&ctx, provider.as_deref(), *format),
        CliCommand::Delete { target, id } => delete(&ctx, *target, id),
        CliCommand::Cleanup {
            max_age_days,
            max_count,
        } => cleanup(&ctx, *max_age_days, *max_count),
        CliCommand::Stats => stats(&ctx),
    }
}

/// Render `err` through the actionable error model and pick the exit code
fn report_error(err: &anyhow::Error, no_color: bool) -> i32 {
    if let Some(e) = err.downcast_ref::<Error>() {
        if e.is_cancelled() {
            eprintln!("Interrupted");
            return EXIT_INTERRUPTED;
        }
        let actionable = ActionableError::from(e);
        actionable::display_error(&actionable, no_color);
        return actionable.exit_code();
    }
    if let Some(e) = err.downcast_ref::<ConfigError>() {
        let actionable = providers::configuration("Invalid configuration", e.to_string());
        actionable::display_error(&actionable, no_color);
        return actionable.exit_code();
    }
    if let Some(actionable) = err.downcast_ref::<ActionableError>() {
        actionable::display_error(actionable, no_color);
        return actionable.exit_code();
    }
    eprintln!("Error: {:#}", err);
    EXIT_GENERAL
}

fn print(text: &str) -> Result<()> {
    let stdout = std::io::stdout();
    let mut handle = stdout.lock();
    handle.write_all(text.as_bytes())?;
    handle.flush()?;
    Ok(())
}

fn read_snapshot_file(path: &Path) -> vaino::error::Result<Snapshot> {
    let bytes = std::fs::read(path).map_err(|e| Error::io(Phase::Read, path, e))?;
    serde_json::from_slice(&bytes).map_err(|source| Error::Decode {
        path: path.to_path_buf(),
        source,
    })
}

fn import(ctx: &App, files: &[PathBuf]) -> Result<i32> {
    let snapshots = files
        .iter()
        .map(|path| read_snapshot_file(path))
        .collect::<vaino::error::Result<Vec<_>>>()?;

    let saved = if snapshots.len() == 1 {
        vec![ctx.store.save_snapshot(&snapshots[0])?]
    } else {
        ctx.store.save_many(&ctx.cancel, &snapshots)?
    };

    for (snapshot, path) in snapshots.iter().zip(&saved) {
        ctx.status(&format!(
            "Imported snapshot {} ({} resources) to {}",
            snapshot.id,
            snapshot.resources.len(),
            path.display()
        ));
    }
    Ok(0)
}

fn list(ctx: &App, target: ListTarget, format: Option<Format>) -> Result<i32> {
    let formatter = ctx.formatter(format)?;
    let text = match target {
        ListTarget::Snapshots => formatter.snapshot_list(&ctx.store.list_concurrent(&ctx.cancel)?)?,
        ListTarget::Baselines => formatter.baseline_list(&ctx.store.list_baselines()?)?,
        ListTarget::Reports => formatter.report_list(&ctx.store.list_drift_reports()?)?,
    };
    print(&text)?;
    Ok(0)
}

fn show(ctx: &App, id: &str, format: Option<Format>, stream: bool) -> Result<i32> {
    if stream {
        let format = match format {
            Some(format) => format,
            None => ctx.config.output.format.parse::<Format>()?,
        };
        let renderer = StreamRenderer::new(StreamFormat::try_from(format)?);
        let stdout = std::io::stdout();
        let mut handle = stdout.lock();
        let count = renderer.render_stored(&ctx.store, id, &ctx.cancel, &mut handle)?;
        handle.flush()?;
        debug!("streamed {} resources of {}", count, id);
        return Ok(0);
    }

    let formatter = ctx.formatter(format)?;
    match ctx.store.load_snapshot(id) {
        Ok(snapshot) => print(&formatter.snapshot(&snapshot)?)?,
        // Fall back to a baseline with that id or name
        Err(err) if err.is_not_found() => match ctx.store.load_baseline(id) {
            Ok(baseline) => print(&formatter.baseline(&baseline)?)?,
            Err(e) if e.is_not_found() => return Err(err.into()),
            Err(e) => return Err(e.into()),
        },
        Err(err) => return Err(err.into()),
    }
    Ok(0)
}

fn baseline(ctx: &App, name: &str, snapshot: &str, description: &str) -> Result<i32> {
    let baseline = ctx
        .store
        .create_baseline(name, snapshot, description, BTreeMap::new())?;
    ctx.status(&format!(
        "Created baseline {} ({}) from snapshot {}",
        baseline.name, baseline.id, baseline.snapshot_id
    ));
    Ok(0)
}

/// Snapshot behind a baseline id or name, or the snapshot with that id
fn resolve_reference(store: &SnapshotStore, reference: &str) -> vaino::error::Result<Snapshot> {
    match store.load_baseline(reference) {
        Ok(baseline) => {
            if baseline.dangling {
                return Err(Error::NotFound {
                    what: "snapshot",
                    id: baseline.snapshot_id,
                });
            }
            store.load_snapshot(&baseline.snapshot_id)
        }
        Err(err) if err.is_not_found() => store.load_snapshot(reference),
        Err(err) => Err(err),
    }
}

fn diff(ctx: &App, args: &DiffArgs) -> Result<i32> {
    let baseline = resolve_reference(&ctx.store, &args.baseline)?;
    let current = ctx.store.load_snapshot(&args.current)?;

    let differ = Differ::new(DiffOptions {
        ignore_fields: args.ignore.clone(),
        detect_moves: args.detect_moves,
    })?;
    let report = differ.compare(&baseline, &current)?;

    if args.save {
        let path = ctx.store.save_drift_report(&report)?;
        ctx.status(&format!("Saved drift report {} to {}", report.id, path.display()));
    }

    let report = match args.min_severity {
        Some(min) => filter_by_severity(&report, min),
        None => report,
    };
    let text = ctx.formatter(args.format)?.drift_report(&report)?;

    match &args.output {
        Some(path) => {
            render_to_file(&AtomicWriter::new(), path, &text)?;
            ctx.status(&format!("Wrote report to {}", path.display()));
        }
        None => print(&text)?,
    }

    Ok(if has_drift(&report) { EXIT_DRIFT_DETECTED } else { 0 })
}

fn timeline(ctx: &App, provider: Option<&str>, format: Option<Format>) -> Result<i32> {
    let series: Vec<SnapshotInfo> = ctx
        .store
        .list_concurrent(&ctx.cancel)?
        .into_iter()
        .filter(|info| provider.map_or(true, |p| info.provider == p))
        .collect();
    let analysis = TimelineAnalyzer::analyze(&series);
    print(&ctx.formatter(format)?.timeline(&analysis)?)?;
    Ok(0)
}

fn delete(ctx: &App, target: DeleteTarget, id: &str) -> Result<i32> {
    let (what, removed) = match target {
        DeleteTarget::Snapshot => ("snapshot", ctx.store.delete_snapshot(id)?),
        DeleteTarget::Baseline => ("baseline", ctx.store.delete_baseline(id)?),
        DeleteTarget::Report => ("drift report", ctx.store.delete_drift_report(id)?),
    };
    if !removed {
        return Err(Error::NotFound {
            what,
            id: id.to_string(),
        }
        .into());
    }
    ctx.status(&format!("Deleted {} {}", what, id));
    Ok(0)
}

fn cleanup(ctx: &App, max_age_days: Option<u64>, max_count: Option<usize>) -> Result<i32> {
    let max_age = match max_age_days {
        Some(days) => Duration::from_secs(days.saturating_mul(24 * 60 * 60)),
        None => ctx.config.backup_max_age(),
    };
    let max_count = max_count.unwrap_or(ctx.config.storage.backup_max_count);
    let stats = ctx
        .store
        .cleanup_backups(max_age, max_count)
        .context("backup cleanup failed")?;
    ctx.status(&format!(
        "Examined {} backups, removed {}",
        stats.examined, stats.removed
    ));
    Ok(0)
}

fn stats(ctx: &App) -> Result<i32> {
    let stats = ctx.store.stats()?;
    let text = serde_json::to_string_pretty(&stats).map_err(|e| anyhow!(e))?;
    print(&format!("{}\n", text))?;
    Ok(0)
}
