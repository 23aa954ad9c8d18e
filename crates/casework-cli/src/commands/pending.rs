use std::path::Path;

use casework_core::Domain;

use crate::commands::common::{format_item_lines, list_domain_items, open_store};
use crate::error::CliError;

pub async fn run_pending(
    domain: Option<Domain>,
    victim: Option<&str>,
    include_synced: bool,
    as_json: bool,
    db_path: &Path,
) -> Result<(), CliError> {
    let store = open_store(db_path).await?;
    let domains = domain.map_or_else(|| Domain::ALL.to_vec(), |domain| vec![domain]);

    let mut items = Vec::new();
    for domain in domains {
        items.extend(list_domain_items(&store, domain, victim, include_synced).await?);
    }

    if as_json {
        println!("{}", serde_json::to_string_pretty(&items)?);
        return Ok(());
    }

    if items.is_empty() {
        println!("Nothing queued.");
        return Ok(());
    }

    for line in format_item_lines(&items) {
        println!("{line}");
    }
    Ok(())
}
