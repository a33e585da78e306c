use crate::backend::ScoringBackend;
use crate::config::Config;
use crate::errors::{AppError, ResultExt};
use crate::models::{ScoringSnapshot, SimulationParameters, UploadFile, UploadForm};
use crate::normalizer;
use crate::pages::{self, DashboardView, NoDataPrompt, PageState, SimulationView};
use crate::projector::{SimulationOutcome, Simulator};
use crate::session::SessionCache;
use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

/// Shared application state injected into handlers.
pub struct AppState {
    /// Application configuration.
    pub config: Config,
    /// Analyzer client, or the offline model.
    pub backend: ScoringBackend,
    /// Scoring result, initial statistics and company name of the session.
    pub session: SessionCache,
    /// Simulation history and in-flight guard.
    pub simulator: Simulator,
}

impl AppState {
    pub fn new(config: Config, backend: ScoringBackend) -> Self {
        let session = SessionCache::new(config.session_cache_capacity);
        Self {
            config,
            backend,
            session,
            simulator: Simulator::new(),
        }
    }
}

/// Routes of the scoring pages. Layers (tracing, CORS, body limit) are added
/// by the caller.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(
            "/upload-request",
            post(upload_request).layer(DefaultBodyLimit::disable()),
        )
        .route("/dashboard", get(dashboard))
        .route("/simulacion", get(simulation))
        .route("/simulacion/run", post(run_simulation))
        .with_state(state)
}

/// Health check endpoint.
pub async fn health(State(state): State<Arc<AppState>>) -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "pyme-scoring",
            "version": env!("CARGO_PKG_VERSION"),
            "offline": state.backend.is_offline(),
        })),
    )
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub company_name: String,
    pub snapshot: ScoringSnapshot,
    /// Page the browser should navigate to next.
    pub redirect: String,
}

/// POST /upload-request
///
/// Accepts the upload page's multipart form, forwards it to the analyzer and
/// stores the normalized result in the session.
pub async fn upload_request(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    let form = read_upload_form(multipart).await?;
    let response = process_upload(&state, form).await?;
    Ok(Json(response))
}

/// Submit, normalize, store. The session is only written once the decision
/// has been fully normalized.
pub async fn process_upload(state: &AppState, form: UploadForm) -> Result<UploadResponse, AppError> {
    form.validate()?;
    let company_name = form.company_name.trim().to_string();

    let raw = state
        .backend
        .submit_upload(&form)
        .await
        .context("uploading company data")?;
    let normalized = normalizer::normalize(&raw).context("normalizing analyzer decision")?;

    state.session.store_result(&company_name, &normalized).await?;
    state.simulator.reset();

    tracing::info!(
        "Upload for '{}' scored {:?}",
        company_name,
        normalized.snapshot.risk_level
    );

    Ok(UploadResponse {
        company_name,
        snapshot: normalized.snapshot,
        redirect: "/dashboard".to_string(),
    })
}

async fn read_upload_form(mut multipart: Multipart) -> Result<UploadForm, AppError> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Invalid multipart body: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);

        if name == "file" || name == "referenceFile" {
            let bytes = field
                .bytes()
                .await
                .map_err(|e| AppError::BadRequest(format!("Failed to read '{}': {}", name, e)))?;
            if bytes.is_empty() {
                continue;
            }
            let file = UploadFile {
                file_name: file_name.unwrap_or_else(|| "documento.pdf".to_string()),
                content_type,
                bytes: bytes.to_vec(),
            };
            if name == "file" {
                form.financial_files.push(file);
            } else {
                form.reference_files.push(file);
            }
            continue;
        }

        let value = field
            .text()
            .await
            .map_err(|e| AppError::BadRequest(format!("Failed to read '{}': {}", name, e)))?;
        let optional = Some(value.clone()).filter(|v| !v.trim().is_empty());
        match name.as_str() {
            "companyName" => form.company_name = value,
            "tradeName" => form.trade_name = optional,
            "country" => form.country = optional,
            "city" => form.city = optional,
            "address" => form.address = optional,
            "instagramUrl" => form.instagram_url = optional,
            "facebookUrl" => form.facebook_url = optional,
            "tiktokUrl" => form.tiktok_url = optional,
            "socialUrl" => form.social_url = optional,
            "references" => form.references = optional,
            other => tracing::debug!("Ignoring unknown upload field '{}'", other),
        }
    }

    Ok(form)
}

/// GET /dashboard
pub async fn dashboard(State(state): State<Arc<AppState>>) -> Json<PageState<DashboardView>> {
    Json(pages::dashboard_page(&state.session).await)
}

/// GET /simulacion
///
/// Entering the page starts a new visit, so earlier runs are dropped.
pub async fn simulation(State(state): State<Arc<AppState>>) -> Json<PageState<SimulationView>> {
    state.simulator.reset();
    Json(pages::simulation_page(&state.session, &state.simulator).await)
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationRequest {
    #[serde(flatten)]
    pub parameters: SimulationParameters,
    #[serde(default)]
    pub label: Option<String>,
}

/// POST /simulacion/run
pub async fn run_simulation(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SimulationRequest>,
) -> Result<Json<PageState<SimulationOutcome>>, AppError> {
    let Some(statistics) = state.session.initial_statistics().await else {
        return Ok(Json(PageState::NoData(NoDataPrompt {
            message: "No hay estadísticas iniciales para simular.".to_string(),
            to: pages::UPLOAD_ROUTE.to_string(),
            button_text: "Nueva evaluación".to_string(),
        })));
    };

    let baseline = pages::simulation_baseline(&statistics);
    let outcome = state
        .simulator
        .run(&state.backend, &baseline, request.parameters, request.label)
        .await?;

    Ok(Json(PageState::Ready(outcome)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offline_state() -> Arc<AppState> {
        Arc::new(AppState::new(Config::default(), ScoringBackend::Offline))
    }

    #[tokio::test]
    async fn test_health_reports_offline_mode() {
        let (status, Json(body)) = health(State(offline_state())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["offline"], true);
    }

    #[tokio::test]
    async fn test_upload_then_dashboard() {
        let state = offline_state();
        let form = UploadForm {
            company_name: "  Textiles Quito  ".to_string(),
            ..Default::default()
        };

        let response = process_upload(&state, form).await.unwrap();
        assert_eq!(response.company_name, "Textiles Quito");
        assert_eq!(response.redirect, "/dashboard");

        let Json(page) = dashboard(State(state.clone())).await;
        let view = page.ready().unwrap();
        assert_eq!(view.company_name, "Textiles Quito");
        assert_eq!(view.risk_factors, response.snapshot.risk_factors);
        assert_eq!(view.summary_paragraphs.len(), 2);
    }

    #[tokio::test]
    async fn test_invalid_upload_leaves_session_empty() {
        let state = offline_state();
        let err = process_upload(&state, UploadForm::default())
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::BadRequest(_)));
        let Json(page) = dashboard(State(state)).await;
        assert!(page.is_no_data());
    }

    #[tokio::test]
    async fn test_run_simulation_without_upload_is_no_data() {
        let request = SimulationRequest {
            parameters: SimulationParameters::default(),
            label: None,
        };
        let Json(page) = run_simulation(State(offline_state()), Json(request))
            .await
            .unwrap();
        assert!(page.is_no_data());
    }

    #[test]
    fn test_simulation_request_shape() {
        let request: SimulationRequest = serde_json::from_str(
            r#"{"income": 60, "reputation": 85, "onTimePayment": 97, "label": "Meta 2025"}"#,
        )
        .unwrap();
        assert_eq!(request.parameters.reputation, 85.0);
        assert_eq!(request.label.as_deref(), Some("Meta 2025"));
    }
}
