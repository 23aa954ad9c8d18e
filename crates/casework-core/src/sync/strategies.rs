//! Remote API strategies for each artifact domain.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use super::engine::{DomainSync, SyncEngine, SyncStrategy, NO_BINARY_REFERENCE};
use crate::connectivity::ConnectivityMonitor;
use crate::models::{
    ArtifactPayload, BinaryBlob, ContractPayload, PendingArtifact, SurveyAnswerPayload,
    VictimDocumentPayload, VictimPhotoPayload,
};
use crate::remote::ApiClient;
use crate::store::LocalStore;
use crate::Result;

const CONTRACT_ROUTE: &str = "contrat";
const VICTIM_ROUTE: &str = "victime";
const DOCUMENT_ROUTE: &str = "document-victime";
const SURVEY_ROUTE: &str = "reponse-questionnaire";

/// Strategy backed by the case-management HTTP API.
#[derive(Debug, Clone)]
pub struct ApiStrategy {
    api: ApiClient,
}

impl ApiStrategy {
    pub const fn new(api: ApiClient) -> Self {
        Self { api }
    }

    async fn upload_blob(&self, blob: &BinaryBlob) -> Result<String> {
        self.api.upload_binary(blob).await
    }
}

#[async_trait]
impl SyncStrategy<ContractPayload> for ApiStrategy {
    async fn upload(
        &self,
        _artifact: &PendingArtifact<ContractPayload>,
        blob: &BinaryBlob,
    ) -> Result<String> {
        self.upload_blob(blob).await
    }

    async fn attach(
        &self,
        artifact: &PendingArtifact<ContractPayload>,
        reference: &str,
    ) -> Result<()> {
        let body = contract_body(artifact, reference);
        self.api
            .post_json(CONTRACT_ROUTE, &body, Some(artifact.idempotency_key))
            .await
    }
}

#[async_trait]
impl SyncStrategy<VictimPhotoPayload> for ApiStrategy {
    async fn upload(
        &self,
        _artifact: &PendingArtifact<VictimPhotoPayload>,
        blob: &BinaryBlob,
    ) -> Result<String> {
        self.upload_blob(blob).await
    }

    async fn attach(
        &self,
        artifact: &PendingArtifact<VictimPhotoPayload>,
        reference: &str,
    ) -> Result<()> {
        let route = format!(
            "{VICTIM_ROUTE}/{}",
            urlencoding::encode(&artifact.subject_id)
        );
        self.api
            .patch_json(
                &route,
                &json!({ "photo": reference }),
                Some(artifact.idempotency_key),
            )
            .await
    }
}

#[async_trait]
impl SyncStrategy<VictimDocumentPayload> for ApiStrategy {
    async fn upload(
        &self,
        _artifact: &PendingArtifact<VictimDocumentPayload>,
        blob: &BinaryBlob,
    ) -> Result<String> {
        self.upload_blob(blob).await
    }

    async fn attach(
        &self,
        artifact: &PendingArtifact<VictimDocumentPayload>,
        reference: &str,
    ) -> Result<()> {
        self.api
            .post_json(
                DOCUMENT_ROUTE,
                &document_body(artifact, reference),
                Some(artifact.idempotency_key),
            )
            .await
    }
}

#[async_trait]
impl SyncStrategy<SurveyAnswerPayload> for ApiStrategy {
    async fn upload(
        &self,
        _artifact: &PendingArtifact<SurveyAnswerPayload>,
        blob: &BinaryBlob,
    ) -> Result<String> {
        self.upload_blob(blob).await
    }

    async fn attach(
        &self,
        artifact: &PendingArtifact<SurveyAnswerPayload>,
        _reference: &str,
    ) -> Result<()> {
        self.api
            .post_json(
                SURVEY_ROUTE,
                &survey_body(artifact),
                Some(artifact.idempotency_key),
            )
            .await
    }
}

/// One engine per domain, all talking to the same API.
pub fn api_engines(
    store: &LocalStore,
    api: &ApiClient,
    connectivity: &Arc<dyn ConnectivityMonitor>,
    request_timeout: Duration,
) -> Vec<Arc<dyn DomainSync>> {
    vec![
        api_engine::<ContractPayload>(store, api, connectivity, request_timeout),
        api_engine::<VictimPhotoPayload>(store, api, connectivity, request_timeout),
        api_engine::<VictimDocumentPayload>(store, api, connectivity, request_timeout),
        api_engine::<SurveyAnswerPayload>(store, api, connectivity, request_timeout),
    ]
}

fn api_engine<P>(
    store: &LocalStore,
    api: &ApiClient,
    connectivity: &Arc<dyn ConnectivityMonitor>,
    request_timeout: Duration,
) -> Arc<dyn DomainSync>
where
    P: ArtifactPayload,
    ApiStrategy: SyncStrategy<P>,
{
    Arc::new(
        SyncEngine::<P, _>::new(
            store.clone(),
            ApiStrategy::new(api.clone()),
            Arc::clone(connectivity),
        )
        .with_request_timeout(request_timeout),
    )
}

fn contract_body(artifact: &PendingArtifact<ContractPayload>, reference: &str) -> Value {
    let contract = &artifact.payload;
    let mut body: Map<String, Value> = contract.details.clone();
    body.insert(
        "trancheSchedule".to_string(),
        json!(contract.tranche_schedule),
    );
    body.insert("consentTerms".to_string(), json!(contract.consent_terms));
    body.insert(
        "consentDataSharing".to_string(),
        json!(contract.consent_data_sharing),
    );
    let signature = if reference == NO_BINARY_REFERENCE {
        Value::Null
    } else {
        json!(reference)
    };
    body.insert("signature".to_string(), signature);
    body.insert("victimeId".to_string(), json!(artifact.subject_id));
    Value::Object(body)
}

fn document_body(artifact: &PendingArtifact<VictimDocumentPayload>, reference: &str) -> Value {
    json!({
        "label": artifact.payload.label,
        "lien": reference,
        "victimeId": artifact.subject_id,
        "userId": artifact.payload.user_id,
    })
}

fn survey_body(artifact: &PendingArtifact<SurveyAnswerPayload>) -> Value {
    json!({
        "questionnaireId": artifact.payload.questionnaire_id,
        "reponses": artifact.payload.answers,
        "victimeId": artifact.subject_id,
    })
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use uuid::Uuid;

    use super::*;
    use crate::models::{ArtifactId, Tranche};

    fn artifact<P>(payload: P) -> PendingArtifact<P> {
        PendingArtifact {
            id: ArtifactId::new(1),
            subject_id: "v-42".to_string(),
            payload,
            created_at: 1_700_000_000_000,
            idempotency_key: Uuid::now_v7(),
            synced: false,
            synced_at: None,
            remote_reference: None,
            upload_reference: None,
        }
    }

    fn contract() -> ContractPayload {
        let mut details = Map::new();
        details.insert("montant".to_string(), json!(30_000));
        ContractPayload {
            tranche_schedule: vec![Tranche {
                label: "first".to_string(),
                amount_cents: 15_000,
                due_date: NaiveDate::from_ymd_opt(2026, 11, 1).unwrap(),
            }],
            consent_terms: true,
            consent_data_sharing: false,
            details,
            signature: None,
        }
    }

    #[test]
    fn contract_body_substitutes_signature_reference() {
        let body = contract_body(&artifact(contract()), "https://cdn/sig.png");

        assert_eq!(body["signature"], "https://cdn/sig.png");
        assert_eq!(body["victimeId"], "v-42");
        assert_eq!(body["montant"], 30_000);
        assert_eq!(body["consentTerms"], true);
        assert_eq!(body["trancheSchedule"][0]["amountCents"], 15_000);
        assert_eq!(body["trancheSchedule"][0]["dueDate"], "2026-11-01");
    }

    #[test]
    fn contract_body_without_signature_sends_null() {
        let body = contract_body(&artifact(contract()), NO_BINARY_REFERENCE);
        assert_eq!(body["signature"], Value::Null);
    }

    #[test]
    fn document_body_links_reference() {
        let file = BinaryBlob::new("id.pdf", "application/pdf", vec![1]).unwrap();
        let payload = VictimDocumentPayload::new("ID card", "u-7", file).unwrap();
        let body = document_body(&artifact(payload), "https://cdn/id.pdf");

        assert_eq!(
            body,
            json!({
                "label": "ID card",
                "lien": "https://cdn/id.pdf",
                "victimeId": "v-42",
                "userId": "u-7",
            })
        );
    }

    #[test]
    fn survey_body_forwards_answers() {
        let payload = SurveyAnswerPayload {
            questionnaire_id: "intake".to_string(),
            answers: json!({"q1": "oui"}),
        };
        let body = survey_body(&artifact(payload));

        assert_eq!(body["questionnaireId"], "intake");
        assert_eq!(body["reponses"]["q1"], "oui");
        assert_eq!(body["victimeId"], "v-42");
    }
}
