//! Working set of target symbols for a scrape session.

mod sp500;

use std::collections::BTreeSet;

use crate::domain::Symbol;
use crate::error::RegistryError;

/// Deduplicated set of target symbols. Built at session start, mutated
/// through explicit calls, discarded with the session; persistence (if
/// any) is the caller's concern.
#[derive(Debug, Clone, Default)]
pub struct SymbolRegistry {
    symbols: BTreeSet<Symbol>,
}

impl SymbolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotent union into the set.
    pub fn add(&mut self, symbols: impl IntoIterator<Item = Symbol>) {
        self.symbols.extend(symbols);
    }

    pub fn remove(&mut self, symbols: impl IntoIterator<Item = Symbol>) {
        for symbol in symbols {
            self.symbols.remove(&symbol);
        }
    }

    /// Union a recognized bulk list into the set. Returns how many
    /// symbols were actually new.
    pub fn add_known_list(&mut self, name: &str) -> Result<usize, RegistryError> {
        let roster: &[&str] = match name.to_ascii_lowercase().as_str() {
            "sp500" => sp500::SP500,
            _ => {
                return Err(RegistryError::UnknownList {
                    name: name.to_owned(),
                })
            }
        };

        let before = self.symbols.len();
        self.add(
            roster
                .iter()
                .map(|s| Symbol::parse(s).expect("bundled list symbols are valid")),
        );
        Ok(self.symbols.len() - before)
    }

    /// Snapshot copy, safe to iterate while the registry mutates later.
    pub fn all(&self) -> BTreeSet<Symbol> {
        self.symbols.clone()
    }

    pub fn contains(&self, symbol: &Symbol) -> bool {
        self.symbols.contains(symbol)
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}
