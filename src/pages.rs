//! View models for the dashboard and simulation pages.
//!
//! Pages that depend on an earlier upload return [`PageState::NoData`] when
//! the session has nothing for them; they never fall back to zeros.

use crate::models::{RawStatistics, RiskFactor, RiskLevel, SimulationParameters, SimulationRun};
use crate::normalizer::risk_factors;
use crate::projector::{Simulator, HISTORY_CAPACITY};
use crate::session::SessionCache;
use serde::Serialize;

pub const UPLOAD_ROUTE: &str = "/upload-request";

/// Prompt sending the user back to the upload flow.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NoDataPrompt {
    pub message: String,
    pub to: String,
    pub button_text: String,
}

impl NoDataPrompt {
    fn upload_first(message: &str) -> Self {
        Self {
            message: message.to_string(),
            to: UPLOAD_ROUTE.to_string(),
            button_text: "Nueva evaluación".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", content = "data", rename_all = "camelCase")]
pub enum PageState<T> {
    Ready(T),
    NoData(NoDataPrompt),
}

impl<T> PageState<T> {
    pub fn is_no_data(&self) -> bool {
        matches!(self, PageState::NoData(_))
    }

    pub fn ready(self) -> Option<T> {
        match self {
            PageState::Ready(view) => Some(view),
            PageState::NoData(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskBadge {
    pub level: RiskLevel,
    pub label: String,
    pub tone: String,
}

impl From<RiskLevel> for RiskBadge {
    fn from(level: RiskLevel) -> Self {
        Self {
            level,
            label: level.display_label().to_string(),
            tone: level.tone().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardView {
    pub company_name: String,
    pub risk: RiskBadge,
    pub credit_suggested: f64,
    pub currency: String,
    pub key_factors: Vec<String>,
    pub risk_factors: Vec<RiskFactor>,
    pub summary_paragraphs: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationView {
    pub company_name: Option<String>,
    pub baseline: Vec<RiskFactor>,
    pub defaults: SimulationParameters,
    pub history: Vec<SimulationRun>,
    pub history_capacity: usize,
    pub running: bool,
}

pub async fn dashboard_page(session: &SessionCache) -> PageState<DashboardView> {
    let (Some(snapshot), Some(company_name)) =
        (session.snapshot().await, session.company_name().await)
    else {
        tracing::debug!("Dashboard requested without a scoring result in session");
        return PageState::NoData(NoDataPrompt::upload_first(
            "Aún no hay una evaluación de riesgo. Sube los datos de la empresa para ver el dashboard.",
        ));
    };

    PageState::Ready(DashboardView {
        company_name,
        risk: snapshot.risk_level.into(),
        credit_suggested: snapshot.credit_suggested,
        currency: snapshot.currency.clone(),
        key_factors: snapshot.key_factors.clone(),
        risk_factors: snapshot.risk_factors.clone(),
        summary_paragraphs: snapshot.paragraphs().into_iter().map(String::from).collect(),
    })
}

/// Baseline the simulator projects against, derived from the cached statistics.
pub fn simulation_baseline(statistics: &RawStatistics) -> Vec<RiskFactor> {
    risk_factors(statistics)
}

pub async fn simulation_page(
    session: &SessionCache,
    simulator: &Simulator,
) -> PageState<SimulationView> {
    let Some(statistics) = session.initial_statistics().await else {
        tracing::debug!("Simulation requested without initial statistics in session");
        return PageState::NoData(NoDataPrompt::upload_first(
            "Para simular escenarios primero necesitamos una evaluación inicial de la empresa.",
        ));
    };

    PageState::Ready(SimulationView {
        company_name: session.company_name().await,
        baseline: simulation_baseline(&statistics),
        defaults: SimulationParameters::default(),
        history: simulator.history(),
        history_capacity: HISTORY_CAPACITY,
        running: simulator.is_running(),
    })
}
