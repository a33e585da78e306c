use crate::config::Config;
use crate::errors::AppError;
use crate::local_model;
use crate::models::{RawDecisionEnvelope, SimulationParameters, SimulationResponse, UploadForm};
use crate::scoring_client::RemoteScoringClient;
use std::time::Duration;

/// Where uploads and simulations are answered.
///
/// `Offline` is the fixture seam: it produces decisions in exactly the same
/// envelope as the analyzer, so nothing downstream has to tell them apart.
#[derive(Clone)]
pub enum ScoringBackend {
    Remote(RemoteScoringClient),
    Offline,
}

impl ScoringBackend {
    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        match config.scoring_api_url {
            Some(ref url) => {
                let client = RemoteScoringClient::new(
                    url.clone(),
                    Duration::from_secs(config.scoring_timeout_secs),
                )?;
                tracing::info!("✓ Remote scoring client initialized: {}", url);
                Ok(ScoringBackend::Remote(client))
            }
            None => {
                tracing::info!("Offline scoring model enabled");
                Ok(ScoringBackend::Offline)
            }
        }
    }

    pub fn is_offline(&self) -> bool {
        matches!(self, ScoringBackend::Offline)
    }

    pub async fn submit_upload(&self, form: &UploadForm) -> Result<RawDecisionEnvelope, AppError> {
        match self {
            ScoringBackend::Remote(client) => client.submit_upload(form).await,
            ScoringBackend::Offline => Ok(local_model::fixture_decision(form)),
        }
    }

    pub async fn submit_simulation(
        &self,
        params: &SimulationParameters,
    ) -> Result<SimulationResponse, AppError> {
        match self {
            ScoringBackend::Remote(client) => client.submit_simulation(params).await,
            ScoringBackend::Offline => Ok(local_model::simulate(params)),
        }
    }
}
