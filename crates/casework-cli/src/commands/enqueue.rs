use std::path::Path;

use casework_core::models::{
    ArtifactPayload, ContractPayload, SurveyAnswerPayload, Tranche, VictimDocumentPayload,
    VictimPhotoPayload,
};
use casework_core::{ArtifactId, PendingQueue};
use chrono::NaiveDate;
use serde_json::{Map, Value};

use crate::cli::EnqueueCommands;
use crate::commands::common::{open_store, read_blob};
use crate::error::CliError;

pub async fn run_enqueue(artifact: EnqueueCommands, db_path: &Path) -> Result<(), CliError> {
    let store = open_store(db_path).await?;

    let (domain, id) = match artifact {
        EnqueueCommands::Contract {
            victim,
            tranches,
            consent_terms,
            consent_data_sharing,
            signature,
            fields,
        } => {
            let payload = ContractPayload {
                tranche_schedule: tranches
                    .iter()
                    .map(String::as_str)
                    .map(parse_tranche)
                    .collect::<Result<_, _>>()?,
                consent_terms,
                consent_data_sharing,
                details: parse_fields(&fields)?,
                signature: signature.as_deref().map(read_blob).transpose()?,
            };
            enqueue(&store, &victim, payload).await?
        }
        EnqueueCommands::Photo { victim, path } => {
            let payload = VictimPhotoPayload {
                photo: read_blob(&path)?,
            };
            enqueue(&store, &victim, payload).await?
        }
        EnqueueCommands::Document {
            victim,
            label,
            user,
            path,
        } => {
            let payload = VictimDocumentPayload::new(label, user, read_blob(&path)?)?;
            enqueue(&store, &victim, payload).await?
        }
        EnqueueCommands::Survey {
            victim,
            questionnaire,
            answers,
        } => {
            let questionnaire_id = questionnaire.trim().to_string();
            if questionnaire_id.is_empty() {
                return Err(CliError::InvalidArgument(
                    "Questionnaire ID cannot be empty".to_string(),
                ));
            }
            let payload = SurveyAnswerPayload {
                questionnaire_id,
                answers: parse_answers(&answers)?,
            };
            enqueue(&store, &victim, payload).await?
        }
    };

    println!("{domain} {id}");
    Ok(())
}

async fn enqueue<P: ArtifactPayload>(
    store: &casework_core::LocalStore,
    victim: &str,
    payload: P,
) -> Result<(&'static str, ArtifactId), CliError> {
    let queue = PendingQueue::<P>::new(store.clone());
    let id = queue.enqueue(victim, payload).await?;
    Ok((P::DOMAIN.as_str(), id))
}

/// Parse `LABEL:AMOUNT_CENTS:YYYY-MM-DD`.
pub fn parse_tranche(raw: &str) -> Result<Tranche, CliError> {
    let invalid = || {
        CliError::InvalidArgument(format!(
            "Tranche must look like LABEL:AMOUNT_CENTS:YYYY-MM-DD, got '{raw}'"
        ))
    };

    let mut parts = raw.rsplitn(3, ':');
    let due_date = parts.next().ok_or_else(invalid)?;
    let amount = parts.next().ok_or_else(invalid)?;
    let label = parts.next().ok_or_else(invalid)?.trim();
    if label.is_empty() {
        return Err(invalid());
    }

    Ok(Tranche {
        label: label.to_string(),
        amount_cents: amount.trim().parse().map_err(|_| invalid())?,
        due_date: NaiveDate::parse_from_str(due_date.trim(), "%Y-%m-%d").map_err(|_| invalid())?,
    })
}

/// Parse repeated `KEY=VALUE` fields; values that parse as JSON keep their type.
pub fn parse_fields(fields: &[String]) -> Result<Map<String, Value>, CliError> {
    let mut details = Map::new();
    for field in fields {
        let (key, value) = field.split_once('=').ok_or_else(|| {
            CliError::InvalidArgument(format!("Field must look like KEY=VALUE, got '{field}'"))
        })?;
        let key = key.trim();
        if key.is_empty() {
            return Err(CliError::InvalidArgument(format!(
                "Field key cannot be empty in '{field}'"
            )));
        }
        let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
        details.insert(key.to_string(), value);
    }
    Ok(details)
}

/// Answers are inline JSON, or `@PATH` to a JSON file.
pub fn parse_answers(raw: &str) -> Result<Value, CliError> {
    let text = match raw.trim().strip_prefix('@') {
        Some(path) => std::fs::read_to_string(path.trim())?,
        None => raw.to_string(),
    };
    serde_json::from_str(&text)
        .map_err(|error| CliError::InvalidArgument(format!("Answers are not valid JSON: {error}")))
}
