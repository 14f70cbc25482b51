use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use quarry_core::{
    plan_order, AlphaVantageClient, CsvRecordStore, FileCredentialStore, Pacer, RateBudget,
    ReqwestHttpClient, RunState, SchedulerConfig, ScrapeRun, ScrapeScheduler, Symbol, SymbolState,
};
use quarry_store::CsvStore;

use crate::cli::ScrapeArgs;
use crate::error::CliError;

pub async fn run(args: &ScrapeArgs, store: &CsvStore) -> Result<(), CliError> {
    let credentials = FileCredentialStore::in_home(store.root());
    let http = Arc::new(ReqwestHttpClient::new());
    let client = AlphaVantageClient::from_credentials(http, &credentials)?
        .with_function(args.function.clone());
    let dataset = client.function().to_owned();

    let mut pacer = Pacer::new(RateBudget::new(
        args.rate_limit,
        Duration::from_secs(args.rate_window_secs),
    ));
    if let Some(cap) = args.daily_limit {
        pacer = pacer.with_daily_cap(cap);
    }

    let record_store = Arc::new(CsvRecordStore::new(store.clone(), dataset.clone()));
    let scheduler = ScrapeScheduler::new(Arc::new(client), Arc::new(pacer), record_store)
        .with_config(SchedulerConfig {
            max_retries: args.max_retries,
            ..SchedulerConfig::default()
        });

    // Checkpoint after every resolved symbol so an abrupt exit loses at
    // most the in-flight request.
    let checkpoint_store = store.clone();
    let scheduler = scheduler.with_progress(Arc::new(move |run: &ScrapeRun, symbol: &Symbol| {
        report_progress(run, symbol);
        if let Err(error) = checkpoint_store.save_checkpoint(&run.id, &run.checkpoint()) {
            tracing::warn!(run_id = %run.id, error = %error, "checkpoint write failed");
        }
    }));

    let cancel = scheduler.cancel_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("interrupt received; finishing the current request");
            cancel.cancel();
        }
    });

    let mut run = match &args.resume {
        Some(run_id) => ScrapeRun::from_checkpoint(store.load_checkpoint(run_id)?)?,
        None => {
            let symbols = target_symbols(args, store)?;
            if symbols.is_empty() {
                return Err(CliError::Command(String::from(
                    "no symbols to scrape; add some with 'quarry symbols add'",
                )));
            }
            if args.stale_first {
                scheduler.start_with_order(stale_first_order(store, &dataset, symbols)?)
            } else {
                scheduler.start(symbols)
            }
        }
    };

    println!(
        "run {} ({} symbols pending)",
        run.id,
        run.pending_symbols().len()
    );

    let status = match &args.resume {
        Some(_) => scheduler.resume(&mut run).await?,
        None => scheduler.run(&mut run).await?,
    };
    store.save_checkpoint(&run.id, &run.checkpoint())?;

    println!(
        "completed: {}  failed: {}  pending: {}",
        status.completed.len(),
        status.failed.len(),
        status.pending.len()
    );
    if run.state == RunState::Interrupted {
        println!("run interrupted; resume with: quarry scrape --resume {}", run.id);
    }
    Ok(())
}

fn target_symbols(args: &ScrapeArgs, store: &CsvStore) -> Result<BTreeSet<Symbol>, CliError> {
    if args.symbols.is_empty() {
        return Ok(super::symbols::load_registry(store.root())?.all());
    }
    args.symbols
        .iter()
        .map(|raw| Symbol::parse(raw).map_err(CliError::from))
        .collect()
}

fn stale_first_order(
    store: &CsvStore,
    dataset: &str,
    symbols: BTreeSet<Symbol>,
) -> Result<Vec<Symbol>, CliError> {
    let mut last_scraped: HashMap<Symbol, SystemTime> = HashMap::new();
    for entry in store.scraped_at(dataset)? {
        // Files that are not valid symbols are someone else's; skip them.
        if let Ok(symbol) = Symbol::parse(&entry.symbol) {
            last_scraped.insert(symbol, entry.modified);
        }
    }
    Ok(plan_order(&symbols, &last_scraped))
}

fn report_progress(run: &ScrapeRun, symbol: &Symbol) {
    match run.progress(symbol).map(|p| &p.state) {
        Some(SymbolState::Completed { rows }) => println!("  {symbol}: {rows} rows"),
        Some(SymbolState::Failed { reason }) => println!("  {symbol}: failed ({reason})"),
        _ => {}
    }
}
