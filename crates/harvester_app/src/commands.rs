use anyhow::{anyhow, Context, Result};
use engine_logging::engine_info;
use harvester_core::{HarvestReport, StopReason};
use harvester_engine::{CursorStore, HarvestController, HarvestError, HarvestSettings};

use crate::cli::{Cli, Command, CursorCommand, QueryArgs, RunArgs};
use crate::lock::QueryLock;

pub fn dispatch(cli: Cli) -> Result<()> {
    let settings = load_settings(&cli)?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("starting async runtime")?;

    match cli.command {
        Command::Run(args) => runtime.block_on(run(settings, args)),
        Command::Cursor(CursorCommand::Show(args)) => runtime.block_on(show_cursor(settings, args)),
        Command::Cursor(CursorCommand::Reset(args)) => {
            runtime.block_on(reset_cursor(settings, args))
        }
    }
}

/// Defaults, then the settings file, then the environment, then global flags.
fn load_settings(cli: &Cli) -> Result<HarvestSettings> {
    let mut settings = match &cli.settings {
        Some(path) => HarvestSettings::from_file(path).map_err(configuration)?,
        None => HarvestSettings::default(),
    };
    settings.apply_env().map_err(configuration)?;
    if let Some(dir) = &cli.data_dir {
        settings.data_dir = dir.clone();
    }
    Ok(settings)
}

async fn run(mut settings: HarvestSettings, args: RunArgs) -> Result<()> {
    if let Some(pages) = args.pages {
        settings.page_budget = pages;
    }
    if let Some(source) = args.source {
        settings.source = source;
    }
    if let Some(country) = args.country {
        settings.country_code = Some(country);
    }
    if args.no_render_js {
        settings.render_js = false;
    }

    let query = args.query.to_query();
    let query_key = query.key();
    let source = settings.build_source(query).map_err(configuration)?;
    let cursors = settings.cursor_store();
    let _lock = QueryLock::acquire(&cursors, &query_key)?;

    engine_info!(
        "Harvesting {:?} via {:?} into {}",
        args.query.query,
        settings.source,
        settings.sink_path().display()
    );
    let controller = HarvestController::new(query_key, source, settings.sink(), cursors)
        .with_page_budget(settings.page_budget);

    match controller.run().await {
        Ok(report) => {
            print_report(&report);
            Ok(())
        }
        Err(err) => {
            if let Some(report) = err.report() {
                print_report(report);
            }
            Err(failure(err))
        }
    }
}

async fn show_cursor(settings: HarvestSettings, args: QueryArgs) -> Result<()> {
    let key = args.to_query().key();
    let store = settings.cursor_store();
    let cursor = store
        .load(&key)
        .await
        .map_err(|err| anyhow!("connectivity: {err}"))?;

    match cursor {
        Some(cursor) => println!("{cursor}"),
        None => println!("no stored cursor; the next run starts from the first page"),
    }
    Ok(())
}

async fn reset_cursor(settings: HarvestSettings, args: QueryArgs) -> Result<()> {
    let key = args.to_query().key();
    let store = settings.cursor_store();
    let _lock = QueryLock::acquire(&store, &key)?;
    store
        .store(&key, None)
        .await
        .map_err(|err| anyhow!("connectivity: {err}"))?;
    engine_info!("Cleared cursor for {:?}", key);
    println!("cursor cleared");
    Ok(())
}

fn configuration(err: harvester_engine::SettingsError) -> anyhow::Error {
    failure(HarvestError::from(err))
}

fn failure(err: HarvestError) -> anyhow::Error {
    anyhow!("{}: {err}", err.reason_code())
}

fn print_report(report: &HarvestReport) {
    let stats = &report.stats;
    println!(
        "appended {} new listings over {} pages ({} duplicates skipped, {} rejected)",
        stats.appended, stats.pages_fetched, stats.skipped_duplicates, stats.rejected
    );
    let outcome = match &report.stop {
        Some(StopReason::Exhausted) => "results exhausted, the next run starts over".to_string(),
        Some(StopReason::BudgetReached) => "page budget reached".to_string(),
        Some(StopReason::EmptyPage) => "provider returned an empty page".to_string(),
        Some(StopReason::ProviderFailed(reason)) => format!("provider failed: {reason}"),
        None => "stopped before fetching".to_string(),
    };
    match &report.cursor {
        Some(cursor) if report.storage_failure.is_none() => {
            println!("{outcome}; resume from {cursor}")
        }
        _ => println!("{outcome}"),
    }
}
