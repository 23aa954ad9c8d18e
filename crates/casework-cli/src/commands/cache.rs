use std::path::Path;

use casework_core::FreshnessCache;

use crate::cli::CacheCommands;
use crate::commands::common::open_store;
use crate::error::CliError;

pub async fn run_cache(command: CacheCommands, db_path: &Path) -> Result<(), CliError> {
    match command {
        CacheCommands::Clear { key } => {
            let cache = FreshnessCache::new(open_store(db_path).await?);
            let removed = cache.clear(key.as_deref()).await?;
            println!("Removed {removed} cache entr{}", if removed == 1 { "y" } else { "ies" });
        }
    }
    Ok(())
}
