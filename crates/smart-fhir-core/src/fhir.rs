//! Minimal FHIR REST reader.
//!
//! Resources are returned as raw JSON; no schema validation is performed.

use log::debug;
use serde_json::Value;
use std::time::Duration;

use crate::error::SmartError;
use crate::utils::mask::{mask_token, truncate_body};

pub const FHIR_JSON: &str = "application/fhir+json";

/// Bearer-authenticated client for a single FHIR base URL
#[derive(Debug, Clone)]
pub struct FhirClient {
    http: reqwest::Client,
    base_url: String,
}

impl FhirClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, SmartError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SmartError::network_with_source("Failed to build HTTP client", e))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `GET {base}/Patient/{id}`
    pub async fn get_patient(&self, id: &str, token: &str) -> Result<Value, SmartError> {
        let path = format!("Patient/{}", urlencoding::encode(id));
        self.get(&path, &[], token).await
    }

    /// `GET {base}/Patient?{params}`, returning the Patient entries of the bundle
    pub async fn search_patients(
        &self,
        params: &[(String, String)],
        token: &str,
    ) -> Result<Vec<Value>, SmartError> {
        let bundle = self.get("Patient", params, token).await?;
        Ok(bundle_resources(&bundle, "Patient"))
    }

    /// `GET {base}/Observation?subject=Patient/{id}`
    pub async fn observations_for_patient(
        &self,
        id: &str,
        token: &str,
    ) -> Result<Vec<Value>, SmartError> {
        let params = [("subject".to_string(), format!("Patient/{id}"))];
        let bundle = self.get("Observation", &params, token).await?;
        Ok(bundle_resources(&bundle, "Observation"))
    }

    async fn get(
        &self,
        path: &str,
        params: &[(String, String)],
        token: &str,
    ) -> Result<Value, SmartError> {
        let url = format!("{}/{path}", self.base_url);
        debug!("FHIR GET {url} (bearer {})", mask_token(token));

        let response = self
            .http
            .get(&url)
            .query(params)
            .bearer_auth(token)
            .header("Accept", FHIR_JSON)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SmartError::fhir(status.as_u16(), truncate_body(&body)));
        }

        Ok(response.json().await?)
    }
}

/// Resources of `resource_type` from `Bundle.entry[].resource`
pub fn bundle_resources(bundle: &Value, resource_type: &str) -> Vec<Value> {
    bundle
        .get("entry")
        .and_then(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .filter_map(|entry| entry.get("resource"))
                .filter(|resource| {
                    resource.get("resourceType").and_then(Value::as_str) == Some(resource_type)
                })
                .cloned()
                .collect()
        })
        .unwrap_or_default()
}
