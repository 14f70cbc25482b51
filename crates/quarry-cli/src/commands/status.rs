use quarry_core::{ScrapeRun, SymbolState};
use quarry_store::CsvStore;

use crate::cli::StatusArgs;
use crate::error::CliError;

pub fn run(args: &StatusArgs, store: &CsvStore) -> Result<(), CliError> {
    let Some(run_id) = &args.run_id else {
        for run_id in store.list_checkpoints()? {
            println!("{run_id}");
        }
        return Ok(());
    };

    let run = ScrapeRun::from_checkpoint(store.load_checkpoint(run_id)?)?;
    let status = run.status();

    println!("run {}", run.id);
    println!("state: {}", run.state.as_str());
    println!("started: {}", run.started_at.format_rfc3339());
    println!(
        "completed: {}  failed: {}  pending: {}",
        status.completed.len(),
        status.failed.len(),
        status.pending.len()
    );

    for symbol in &status.failed {
        if let Some(progress) = run.progress(symbol) {
            if let SymbolState::Failed { reason } = &progress.state {
                println!(
                    "  {symbol}: failed after {} attempts ({reason})",
                    progress.attempts
                );
            }
        }
    }
    Ok(())
}
