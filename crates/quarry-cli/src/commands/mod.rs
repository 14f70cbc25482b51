mod credentials;
mod scrape;
mod status;
mod symbols;

use quarry_store::CsvStore;

use crate::cli::{Cli, Command};
use crate::error::CliError;

pub async fn run(cli: &Cli) -> Result<(), CliError> {
    let store = match &cli.home {
        Some(path) => CsvStore::new(path),
        None => CsvStore::open_default(),
    };

    match &cli.command {
        Command::Credentials(args) => credentials::run(args, &store),
        Command::Symbols(args) => symbols::run(args, &store),
        Command::Scrape(args) => scrape::run(args, &store).await,
        Command::Status(args) => status::run(args, &store),
    }
}
