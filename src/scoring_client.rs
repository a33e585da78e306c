use crate::errors::AppError;
use crate::normalizer;
use crate::models::{
    RawDecisionEnvelope, SimulationParameters, SimulationResponse, UploadFile, UploadForm,
};
use reqwest::multipart::{Form, Part};
use std::time::Duration;

/// Client for the external risk analyzer.
///
/// Each call is a single attempt bounded by the configured timeout; retries
/// are left to the caller. The client holds no state besides the connection
/// pool.
#[derive(Clone)]
pub struct RemoteScoringClient {
    client: reqwest::Client,
    base_url: String,
}

impl RemoteScoringClient {
    /// Creates a new `RemoteScoringClient`.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Base URL of the analyzer, without trailing slash.
    /// * `timeout` - Per-request timeout (300 seconds in production).
    pub fn new(base_url: String, timeout: Duration) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                AppError::InternalError(format!("Failed to create scoring client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Submits company data and documents for evaluation.
    ///
    /// # Returns
    ///
    /// * `Result<RawDecisionEnvelope, AppError>` - The analyzer's decision, not yet normalized.
    pub async fn submit_upload(&self, form: &UploadForm) -> Result<RawDecisionEnvelope, AppError> {
        let url = format!("{}/risk/evaluate", self.base_url);
        tracing::info!(
            "Submitting evaluation for '{}' ({} financial files, {} reference files): {}",
            form.company_name,
            form.financial_files.len(),
            form.reference_files.len(),
            url
        );

        let multipart = build_upload_form(form)?;
        let response = self
            .client
            .post(&url)
            .multipart(multipart)
            .send()
            .await
            .map_err(|e| transport_error("Evaluation request failed", e))?;

        let body = read_success_body(response, "evaluation").await?;
        // Reached the analyzer: an undecodable body is a payload problem, not a transport one
        let envelope = normalizer::parse_decision(&body)?;

        tracing::info!("✓ Evaluation received for '{}'", form.company_name);
        Ok(envelope)
    }

    /// Requests a what-if projection for the given parameters.
    pub async fn submit_simulation(
        &self,
        params: &SimulationParameters,
    ) -> Result<SimulationResponse, AppError> {
        let url = format!("{}/risk/simulate", self.base_url);
        tracing::info!("Requesting simulation {:?}: {}", params, url);

        let fields = [
            ("ingresos", params.income_units().to_string()),
            ("reputacion", params.reputation.to_string()),
            ("pago_a_tiempo", params.on_time_payment.to_string()),
        ];

        let response = self
            .client
            .post(&url)
            .form(&fields)
            .send()
            .await
            .map_err(|e| transport_error("Simulation request failed", e))?;

        let body = read_success_body(response, "simulation").await?;
        let result: SimulationResponse = serde_json::from_str(&body).map_err(|e| {
            AppError::MalformedPayload(format!("Failed to parse simulation response: {}", e))
        })?;

        tracing::info!("✓ Simulation answered with risk {:?}", result.nivel_riesgo);
        Ok(result)
    }
}

fn transport_error(what: &str, e: reqwest::Error) -> AppError {
    if e.is_timeout() {
        AppError::RemoteScoring(format!("{}: timed out ({})", what, e))
    } else {
        AppError::RemoteScoring(format!("{}: {}", what, e))
    }
}

async fn read_success_body(response: reqwest::Response, what: &str) -> Result<String, AppError> {
    let status = response.status();
    if !status.is_success() {
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        tracing::error!("Analyzer {} returned {}: {}", what, status, error_text);
        return Err(AppError::RemoteScoring(format!(
            "Analyzer {} returned {}: {}",
            what, status, error_text
        )));
    }

    response
        .text()
        .await
        .map_err(|e| transport_error("Failed to read analyzer response", e))
}

fn build_upload_form(form: &UploadForm) -> Result<Form, AppError> {
    let links = form.social_links();

    let mut multipart = Form::new()
        .text("razon_social", form.company_name.clone())
        .text("nombre_comercial", form.trade_name_or_company().to_string())
        .text("pais", form.country.clone().unwrap_or_default())
        .text("ciudad", form.city.clone().unwrap_or_default())
        .text("direccion", form.address.clone().unwrap_or_default());

    for (field, value) in [
        ("instagram_url", links.instagram),
        ("facebook_url", links.facebook),
        ("tiktok_url", links.tiktok),
    ] {
        if let Some(url) = value {
            multipart = multipart.text(field, url);
        }
    }

    if let Some(references) = form.references.as_ref().filter(|r| !r.trim().is_empty()) {
        multipart = multipart.text("referencias_texto", references.clone());
    }

    for file in &form.financial_files {
        multipart = multipart.part("financieros_files", file_part(file)?);
    }
    for file in &form.reference_files {
        multipart = multipart.part("referencias_files", file_part(file)?);
    }

    Ok(multipart)
}

fn file_part(file: &UploadFile) -> Result<Part, AppError> {
    let part = Part::bytes(file.bytes.clone()).file_name(file.file_name.clone());
    match file.content_type.as_deref() {
        Some(mime) => part.mime_str(mime).map_err(|e| {
            AppError::BadRequest(format!(
                "Invalid content type '{}' for {}: {}",
                mime, file.file_name, e
            ))
        }),
        None => Ok(part),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_client_creation() {
        let client = RemoteScoringClient::new(
            "https://analyzer.example.com/".to_string(),
            Duration::from_secs(300),
        )
        .unwrap();
        assert_eq!(client.base_url(), "https://analyzer.example.com");
    }

    #[test]
    fn test_invalid_mime_is_bad_request() {
        let file = UploadFile {
            file_name: "estado.pdf".to_string(),
            content_type: Some("not a mime".to_string()),
            bytes: vec![0],
        };
        assert!(matches!(file_part(&file), Err(AppError::BadRequest(_))));
    }
}
