use std::fs;
use std::path::Path;

use quarry_core::{Symbol, SymbolRegistry};
use quarry_store::CsvStore;

use crate::cli::{SymbolsArgs, SymbolsCommand};
use crate::error::CliError;

pub fn run(args: &SymbolsArgs, store: &CsvStore) -> Result<(), CliError> {
    let home = store.root();
    let mut registry = load_registry(home)?;

    match &args.command {
        SymbolsCommand::Add { symbols } => {
            registry.add(parse_all(symbols)?);
            save_registry(home, &registry)?;
            println!("tracking {} symbols", registry.len());
        }
        SymbolsCommand::Remove { symbols } => {
            registry.remove(parse_all(symbols)?);
            save_registry(home, &registry)?;
            println!("tracking {} symbols", registry.len());
        }
        SymbolsCommand::AddList { name } => {
            let added = registry.add_known_list(name)?;
            save_registry(home, &registry)?;
            println!("added {added} new symbols from '{name}' ({} tracked)", registry.len());
        }
        SymbolsCommand::List => {
            for symbol in registry.all() {
                println!("{symbol}");
            }
        }
    }
    Ok(())
}

fn parse_all(raw: &[String]) -> Result<Vec<Symbol>, CliError> {
    raw.iter()
        .map(|s| Symbol::parse(s).map_err(CliError::from))
        .collect()
}

/// Loads the tracked symbol set from `<home>/symbols.json`, an empty
/// registry when the file does not exist yet.
pub fn load_registry(home: &Path) -> Result<SymbolRegistry, CliError> {
    let path = home.join("symbols.json");
    let mut registry = SymbolRegistry::new();

    if path.exists() {
        let names: Vec<String> = serde_json::from_str(&fs::read_to_string(&path)?)?;
        registry.add(parse_all(&names)?);
    }
    Ok(registry)
}

fn save_registry(home: &Path, registry: &SymbolRegistry) -> Result<(), CliError> {
    let names: Vec<String> = registry
        .all()
        .iter()
        .map(|symbol| symbol.as_str().to_owned())
        .collect();

    fs::create_dir_all(home)?;
    fs::write(home.join("symbols.json"), serde_json::to_vec_pretty(&names)?)?;
    Ok(())
}
