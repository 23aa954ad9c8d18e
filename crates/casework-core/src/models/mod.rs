//! Data models for queued artifacts

mod artifact;
mod payloads;

pub(crate) use artifact::ArtifactRecord;
pub use artifact::{ArtifactId, ArtifactPayload, ArtifactState, BinaryBlob, Domain, PendingArtifact};
pub use payloads::{
    ContractPayload, SurveyAnswerPayload, Tranche, VictimDocumentPayload, VictimPhotoPayload,
};
