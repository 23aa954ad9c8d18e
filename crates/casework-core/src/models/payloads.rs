//! Per-domain artifact payloads

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::artifact::{ArtifactPayload, BinaryBlob, Domain};
use crate::error::{Error, Result};

/// One instalment of a contract's payment schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tranche {
    pub label: String,
    pub amount_cents: i64,
    pub due_date: NaiveDate,
}

/// A contract signed on the device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractPayload {
    pub tranche_schedule: Vec<Tranche>,
    pub consent_terms: bool,
    pub consent_data_sharing: bool,
    /// Remaining form fields, forwarded verbatim.
    #[serde(default)]
    pub details: serde_json::Map<String, serde_json::Value>,
    /// Handwritten signature image.
    #[serde(default)]
    pub signature: Option<BinaryBlob>,
}

impl ArtifactPayload for ContractPayload {
    const DOMAIN: Domain = Domain::Contracts;

    fn binary(&self) -> Option<&BinaryBlob> {
        self.signature.as_ref()
    }
}

/// A photograph of the victim, replacing the subject's profile photo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VictimPhotoPayload {
    pub photo: BinaryBlob,
}

impl ArtifactPayload for VictimPhotoPayload {
    const DOMAIN: Domain = Domain::VictimPhotos;

    fn binary(&self) -> Option<&BinaryBlob> {
        Some(&self.photo)
    }
}

/// A document attached to the victim's file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VictimDocumentPayload {
    pub label: String,
    /// User who captured the document.
    pub user_id: String,
    pub file: BinaryBlob,
}

impl VictimDocumentPayload {
    pub fn new(label: impl Into<String>, user_id: impl Into<String>, file: BinaryBlob) -> Result<Self> {
        let label = label.into().trim().to_string();
        let user_id = user_id.into().trim().to_string();

        if label.is_empty() {
            return Err(Error::InvalidInput(
                "Document label cannot be empty".to_string(),
            ));
        }
        if user_id.is_empty() {
            return Err(Error::InvalidInput(
                "Document user_id cannot be empty".to_string(),
            ));
        }

        Ok(Self {
            label,
            user_id,
            file,
        })
    }
}

impl ArtifactPayload for VictimDocumentPayload {
    const DOMAIN: Domain = Domain::VictimDocuments;

    fn binary(&self) -> Option<&BinaryBlob> {
        Some(&self.file)
    }
}

/// Answers to a questionnaire filled in for a victim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurveyAnswerPayload {
    pub questionnaire_id: String,
    pub answers: serde_json::Value,
}

impl ArtifactPayload for SurveyAnswerPayload {
    const DOMAIN: Domain = Domain::SurveyAnswers;

    fn binary(&self) -> Option<&BinaryBlob> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blob() -> BinaryBlob {
        BinaryBlob::new("scan.pdf", "application/pdf", vec![1, 2]).unwrap()
    }

    #[test]
    fn test_contract_binary_is_optional_signature() {
        let mut contract = ContractPayload {
            tranche_schedule: Vec::new(),
            consent_terms: true,
            consent_data_sharing: false,
            details: serde_json::Map::new(),
            signature: None,
        };
        assert!(contract.binary().is_none());

        contract.signature = Some(blob());
        assert_eq!(contract.binary().unwrap().file_name, "scan.pdf");
    }

    #[test]
    fn test_contract_deserializes_without_optional_fields() {
        let contract: ContractPayload = serde_json::from_str(
            r#"{
                "trancheSchedule": [
                    {"label": "first", "amountCents": 15000, "dueDate": "2026-11-01"}
                ],
                "consentTerms": true,
                "consentDataSharing": true
            }"#,
        )
        .unwrap();

        assert_eq!(contract.tranche_schedule.len(), 1);
        assert_eq!(contract.tranche_schedule[0].amount_cents, 15_000);
        assert!(contract.signature.is_none());
        assert!(contract.details.is_empty());
    }

    #[test]
    fn test_document_validation() {
        assert!(VictimDocumentPayload::new(" ", "u-1", blob()).is_err());
        assert!(VictimDocumentPayload::new("ID card", "", blob()).is_err());

        let doc = VictimDocumentPayload::new(" ID card ", "u-1", blob()).unwrap();
        assert_eq!(doc.label, "ID card");
        assert!(doc.binary().is_some());
    }

    #[test]
    fn test_survey_has_no_binary() {
        let survey = SurveyAnswerPayload {
            questionnaire_id: "intake".to_string(),
            answers: serde_json::json!({"q1": "yes"}),
        };
        assert!(survey.binary().is_none());
        assert_eq!(SurveyAnswerPayload::DOMAIN, Domain::SurveyAnswers);
    }
}
