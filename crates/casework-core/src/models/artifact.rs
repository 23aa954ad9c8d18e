//! Pending artifact model

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::store::Partition;

/// Locally assigned artifact identifier, unique within its domain partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ArtifactId(i64);

impl ArtifactId {
    #[must_use]
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ArtifactId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(s.trim().parse()?))
    }
}

/// Artifact domains handled by the sync engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Domain {
    Contracts,
    VictimPhotos,
    VictimDocuments,
    SurveyAnswers,
}

impl Domain {
    pub const ALL: [Self; 4] = [
        Self::Contracts,
        Self::VictimPhotos,
        Self::VictimDocuments,
        Self::SurveyAnswers,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Contracts => "contracts",
            Self::VictimPhotos => "victim-photos",
            Self::VictimDocuments => "victim-documents",
            Self::SurveyAnswers => "survey-answers",
        }
    }

    /// Store partition holding this domain's pending artifacts.
    pub const fn partition(self) -> Partition {
        match self {
            Self::Contracts => Partition::PendingContracts,
            Self::VictimPhotos => Partition::PendingVictimPhotos,
            Self::VictimDocuments => Partition::PendingVictimDocs,
            Self::SurveyAnswers => Partition::PendingSurveyAnswers,
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Domain {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "contracts" | "contract" => Ok(Self::Contracts),
            "victim-photos" | "photos" | "photo" => Ok(Self::VictimPhotos),
            "victim-documents" | "documents" | "document" => Ok(Self::VictimDocuments),
            "survey-answers" | "surveys" | "survey" => Ok(Self::SurveyAnswers),
            other => Err(Error::InvalidInput(format!("Unknown domain: {other}"))),
        }
    }
}

/// Persisted sync state of an artifact. A failed upload or attach leaves it `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactState {
    Pending,
    Synced,
}

/// Binary content queued alongside an artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BinaryBlob {
    /// Original file name.
    pub file_name: String,
    /// Content MIME type.
    pub mime_type: String,
    /// Raw bytes, persisted as base64.
    #[serde(with = "base64_bytes")]
    pub bytes: Vec<u8>,
}

impl BinaryBlob {
    /// Create a validated binary blob.
    pub fn new(
        file_name: impl Into<String>,
        mime_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Result<Self> {
        let file_name = file_name.into().trim().to_string();
        let mime_type = mime_type.into().trim().to_string();

        if file_name.is_empty() {
            return Err(Error::InvalidInput(
                "Binary file_name cannot be empty".to_string(),
            ));
        }
        if mime_type.is_empty() {
            return Err(Error::InvalidInput(
                "Binary mime_type cannot be empty".to_string(),
            ));
        }
        if bytes.is_empty() {
            return Err(Error::InvalidInput(format!(
                "Binary content for {file_name} is empty"
            )));
        }

        Ok(Self {
            file_name,
            mime_type,
            bytes,
        })
    }

    pub fn size_bytes(&self) -> usize {
        self.bytes.len()
    }
}

/// Domain payload carried by a pending artifact.
pub trait ArtifactPayload:
    Serialize + DeserializeOwned + Clone + fmt::Debug + Send + Sync + 'static
{
    /// Domain this payload belongs to.
    const DOMAIN: Domain;

    /// Binary content to upload before attaching, if any.
    fn binary(&self) -> Option<&BinaryBlob>;
}

/// An artifact waiting (or having waited) for delivery to the remote system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingArtifact<P> {
    pub id: ArtifactId,
    /// Remote entity this artifact belongs to (e.g. victim id).
    pub subject_id: String,
    pub payload: P,
    /// Creation timestamp (Unix ms).
    pub created_at: i64,
    /// Client-generated key sent with the attach request.
    pub idempotency_key: Uuid,
    pub synced: bool,
    /// First successful sync timestamp (Unix ms).
    pub synced_at: Option<i64>,
    pub remote_reference: Option<String>,
    /// Reference returned by an upload whose attach has not succeeded yet.
    pub upload_reference: Option<String>,
}

impl<P> PendingArtifact<P> {
    pub const fn state(&self) -> ArtifactState {
        if self.synced {
            ArtifactState::Synced
        } else {
            ArtifactState::Pending
        }
    }
}

/// Persisted form of a pending artifact; the id lives in the store key.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ArtifactRecord<P> {
    pub subject_id: String,
    pub payload: P,
    pub created_at: i64,
    pub idempotency_key: Uuid,
    #[serde(default)]
    pub synced: bool,
    #[serde(default)]
    pub synced_at: Option<i64>,
    #[serde(default)]
    pub remote_reference: Option<String>,
    #[serde(default)]
    pub upload_reference: Option<String>,
}

impl<P> ArtifactRecord<P> {
    pub fn new(subject_id: String, payload: P) -> Self {
        Self {
            subject_id,
            payload,
            created_at: chrono::Utc::now().timestamp_millis(),
            idempotency_key: Uuid::now_v7(),
            synced: false,
            synced_at: None,
            remote_reference: None,
            upload_reference: None,
        }
    }

    pub fn into_artifact(self, id: ArtifactId) -> PendingArtifact<P> {
        PendingArtifact {
            id,
            subject_id: self.subject_id,
            payload: self.payload,
            created_at: self.created_at,
            idempotency_key: self.idempotency_key,
            synced: self.synced,
            synced_at: self.synced_at,
            remote_reference: self.remote_reference,
            upload_reference: self.upload_reference,
        }
    }
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}
