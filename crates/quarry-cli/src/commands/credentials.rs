use quarry_core::{CredentialStore, FileCredentialStore};
use quarry_store::CsvStore;

use crate::cli::{CredentialsArgs, CredentialsCommand};
use crate::error::CliError;

pub fn run(args: &CredentialsArgs, store: &CsvStore) -> Result<(), CliError> {
    let credentials = FileCredentialStore::in_home(store.root());

    match &args.command {
        CredentialsCommand::Set { source, key } => {
            credentials.save(source, key)?;
            println!("saved credential for '{source}'");
        }
        CredentialsCommand::Show { source } => {
            println!("{}", credentials.get(source)?);
        }
    }
    Ok(())
}
