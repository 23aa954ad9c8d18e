use std::path::Path;

use casework_core::models::{
    ArtifactPayload, ContractPayload, SurveyAnswerPayload, VictimDocumentPayload,
    VictimPhotoPayload,
};
use casework_core::{ArtifactId, Domain, Error, LocalStore, PendingQueue};

use crate::commands::common::open_store;
use crate::error::CliError;

pub async fn run_cancel(domain: Domain, id: i64, db_path: &Path) -> Result<(), CliError> {
    let store = open_store(db_path).await?;
    let id = ArtifactId::new(id);

    let removed = match domain {
        Domain::Contracts => delete::<ContractPayload>(&store, id).await?,
        Domain::VictimPhotos => delete::<VictimPhotoPayload>(&store, id).await?,
        Domain::VictimDocuments => delete::<VictimDocumentPayload>(&store, id).await?,
        Domain::SurveyAnswers => delete::<SurveyAnswerPayload>(&store, id).await?,
    };

    if !removed {
        return Err(Error::NotFound(format!("{domain} artifact {id}")).into());
    }
    println!("{domain} {id}");
    Ok(())
}

async fn delete<P: ArtifactPayload>(store: &LocalStore, id: ArtifactId) -> Result<bool, CliError> {
    Ok(PendingQueue::<P>::new(store.clone()).delete(id).await?)
}
