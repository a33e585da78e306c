use crate::errors::AppError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use url::Url;

// ============ Snapshot Models ============

/// Risk classification of a company.
///
/// Parsed from the analyzer's free-text label; anything that is not one of the
/// known labels becomes [`RiskLevel::Unknown`] instead of an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Unknown,
}

impl RiskLevel {
    /// Case-insensitive mapping of the analyzer labels ("bajo", "medio", "alto").
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "bajo" => RiskLevel::Low,
            "medio" => RiskLevel::Medium,
            "alto" => RiskLevel::High,
            _ => RiskLevel::Unknown,
        }
    }

    /// Spanish display label; `Unknown` falls back to a neutral text.
    pub fn display_label(&self) -> &'static str {
        match self {
            RiskLevel::Low => "Bajo",
            RiskLevel::Medium => "Medio",
            RiskLevel::High => "Alto",
            RiskLevel::Unknown => "Sin clasificar",
        }
    }

    /// Visual tone the pages use to color the risk badge.
    pub fn tone(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Unknown => "neutral",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_label())
    }
}

/// One named statistical dimension on the dashboard radar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskFactor {
    pub subject: String,
    pub value: f64,
    pub max_value: f64,
}

/// Normalized, display-ready scoring result for one company.
///
/// Built once per successful upload and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoringSnapshot {
    pub risk_level: RiskLevel,
    pub credit_suggested: f64,
    pub currency: String,
    pub key_factors: Vec<String>,
    pub risk_factors: Vec<RiskFactor>,
    pub summary: String,
}

impl ScoringSnapshot {
    /// Summary split back into its paragraphs.
    pub fn paragraphs(&self) -> Vec<&str> {
        self.summary.split("\n\n").collect()
    }
}

/// Value of one statistic together with its reference maximum.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Statistic {
    pub value: f64,
    pub max: f64,
}

/// Statistics keyed by their lowercase analyzer identifier (e.g. "ventas").
///
/// A `BTreeMap` so that every consumer iterates the keys in the same order.
pub type RawStatistics = BTreeMap<String, Statistic>;

// ============ Simulation Models ============

/// What-if inputs chosen on the simulation page.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationParameters {
    /// Annual income in thousands of currency units.
    pub income: f64,
    /// Digital reputation, percentage in [0, 100].
    pub reputation: f64,
    /// On-time payments, percentage in [0, 100].
    pub on_time_payment: f64,
}

impl SimulationParameters {
    pub fn validate(&self) -> Result<(), AppError> {
        if !self.income.is_finite() || self.income < 0.0 {
            return Err(AppError::BadRequest(
                "income must be a non-negative number".to_string(),
            ));
        }
        for (name, pct) in [
            ("reputation", self.reputation),
            ("onTimePayment", self.on_time_payment),
        ] {
            if !pct.is_finite() || !(0.0..=100.0).contains(&pct) {
                return Err(AppError::BadRequest(format!(
                    "{} must be a percentage between 0 and 100",
                    name
                )));
            }
        }
        Ok(())
    }

    /// Income expressed in whole currency units, as the analyzer expects it.
    pub fn income_units(&self) -> f64 {
        self.income * 1000.0
    }
}

impl Default for SimulationParameters {
    fn default() -> Self {
        Self {
            income: 50.0,
            reputation: 75.0,
            on_time_payment: 90.0,
        }
    }
}

/// A single what-if run kept for comparison on the simulation page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationRun {
    pub label: String,
    /// Positionally aligned with the baseline risk factors.
    pub projected_values: Vec<f64>,
    pub risk_level: RiskLevel,
    /// Label exactly as the analyzer returned it.
    pub raw_risk_level: String,
    pub parameters: SimulationParameters,
    pub created_at: DateTime<Utc>,
}

// ============ Analyzer Wire Models ============

/// Current version of the decision envelope.
pub const DECISION_SCHEMA_VERSION: u32 = 1;

fn default_schema_version() -> u32 {
    DECISION_SCHEMA_VERSION
}

/// Top-level body returned by `POST /risk/evaluate`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawDecisionEnvelope {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub decision: Option<RawDecision>,
}

/// Decision object as produced by the analyzer (Spanish field names).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawDecision {
    #[serde(default)]
    pub empresa: Option<RawCompany>,
    #[serde(rename = "riesgo_interno", alias = "nivel_riesgo", default)]
    pub riesgo: Option<String>,
    #[serde(default)]
    pub credito_sugerido: Option<RawCredit>,
    #[serde(default)]
    pub factores_clave_riesgo: Option<RawKeyFactors>,
    #[serde(default)]
    pub estadisticas: BTreeMap<String, RawStatistic>,
    #[serde(default)]
    pub resumen: Option<RawSummary>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawCompany {
    pub razon_social: Option<String>,
    pub nombre_comercial: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawCredit {
    pub monto: Option<f64>,
    pub moneda: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawKeyFactors {
    #[serde(default)]
    pub top_5: Vec<RawFactor>,
}

/// A ranked factor: either a plain label or a `[label, sign]` group.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawFactor {
    Label(String),
    Group(Vec<serde_json::Value>),
}

/// Statistic as sent over the wire; the analyzer uses `null` for metrics it
/// could not extract.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct RawStatistic {
    pub value: Option<f64>,
    pub max: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawSummary {
    pub parrafo_1: Option<String>,
    pub parrafo_2: Option<String>,
}

/// Suggested credit range returned with simulations.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AmountRange {
    pub min: f64,
    pub max: f64,
}

/// Body returned by `POST /risk/simulate`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SimulationResponse {
    #[serde(default)]
    pub estadisticas: BTreeMap<String, RawStatistic>,
    #[serde(rename = "nivel_riesgo", alias = "riesgo", default)]
    pub nivel_riesgo: Option<String>,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub monto_sugerido: Option<AmountRange>,
}

impl SimulationResponse {
    /// Statistics that carry a value; `null` values are treated as absent.
    pub fn statistics(&self) -> RawStatistics {
        self.estadisticas
            .iter()
            .filter_map(|(key, stat)| {
                stat.value.map(|value| {
                    (
                        key.clone(),
                        Statistic {
                            value,
                            max: stat.max.unwrap_or(0.0),
                        },
                    )
                })
            })
            .collect()
    }
}

// ============ Upload Models ============

/// Maximum number of files the analyzer accepts per category.
pub const MAX_FILES_PER_KIND: usize = 3;

/// A file attached to the upload form.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadFile {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Company and financial data submitted from the upload page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UploadForm {
    pub company_name: String,
    pub trade_name: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
    pub address: Option<String>,
    pub instagram_url: Option<String>,
    pub facebook_url: Option<String>,
    pub tiktok_url: Option<String>,
    /// Free-form social profile link, routed by host in [`UploadForm::social_links`].
    pub social_url: Option<String>,
    pub references: Option<String>,
    pub financial_files: Vec<UploadFile>,
    pub reference_files: Vec<UploadFile>,
}

/// Social profiles grouped by network.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SocialLinks {
    pub instagram: Option<String>,
    pub facebook: Option<String>,
    pub tiktok: Option<String>,
}

impl UploadForm {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.company_name.trim().is_empty() {
            return Err(AppError::BadRequest("companyName is required".to_string()));
        }
        if self.financial_files.len() > MAX_FILES_PER_KIND {
            return Err(AppError::BadRequest(format!(
                "At most {} financial files are accepted",
                MAX_FILES_PER_KIND
            )));
        }
        if self.reference_files.len() > MAX_FILES_PER_KIND {
            return Err(AppError::BadRequest(format!(
                "At most {} reference files are accepted",
                MAX_FILES_PER_KIND
            )));
        }
        Ok(())
    }

    /// Trade name, falling back to the legal company name.
    pub fn trade_name_or_company(&self) -> &str {
        self.trade_name
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(&self.company_name)
    }

    /// Explicit per-network links win; `social_url` fills the slot matching its host.
    pub fn social_links(&self) -> SocialLinks {
        let mut links = SocialLinks {
            instagram: non_blank(&self.instagram_url),
            facebook: non_blank(&self.facebook_url),
            tiktok: non_blank(&self.tiktok_url),
        };

        if let Some(social) = non_blank(&self.social_url) {
            let host = Url::parse(&social)
                .ok()
                .and_then(|u| u.host_str().map(|h| h.to_lowercase()));
            match host.as_deref() {
                Some(h) if h.ends_with("instagram.com") => {
                    links.instagram.get_or_insert(social);
                }
                Some(h) if h.ends_with("facebook.com") || h.ends_with("fb.com") => {
                    links.facebook.get_or_insert(social);
                }
                Some(h) if h.ends_with("tiktok.com") => {
                    links.tiktok.get_or_insert(social);
                }
                _ => tracing::warn!("Ignoring social URL with unsupported host: {}", social),
            }
        }

        links
    }
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_ref()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_risk_level_from_label() {
        assert_eq!(RiskLevel::from_label("BAJO"), RiskLevel::Low);
        assert_eq!(RiskLevel::from_label(" Medio "), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_label("alto"), RiskLevel::High);
        assert_eq!(RiskLevel::from_label("muy alto"), RiskLevel::Unknown);
        assert_eq!(RiskLevel::from_label(""), RiskLevel::Unknown);
        assert_eq!(RiskLevel::Unknown.tone(), "neutral");
    }

    #[test]
    fn test_simulation_parameters_validation() {
        assert!(SimulationParameters::default().validate().is_ok());

        let bad_reputation = SimulationParameters {
            reputation: 120.0,
            ..Default::default()
        };
        assert!(matches!(
            bad_reputation.validate(),
            Err(AppError::BadRequest(_))
        ));

        let bad_income = SimulationParameters {
            income: f64::NAN,
            ..Default::default()
        };
        assert!(bad_income.validate().is_err());
    }

    #[test]
    fn test_simulation_parameters_camel_case() {
        let params: SimulationParameters =
            serde_json::from_str(r#"{"income": 80, "reputation": 60, "onTimePayment": 95}"#)
                .unwrap();
        assert_eq!(params.on_time_payment, 95.0);
        assert_eq!(params.income_units(), 80_000.0);
    }

    #[test]
    fn test_simulation_response_accepts_both_risk_fields() {
        let a: SimulationResponse = serde_json::from_str(r#"{"nivel_riesgo": "Bajo"}"#).unwrap();
        let b: SimulationResponse = serde_json::from_str(r#"{"riesgo": "Alto"}"#).unwrap();
        assert_eq!(a.nivel_riesgo.as_deref(), Some("Bajo"));
        assert_eq!(b.nivel_riesgo.as_deref(), Some("Alto"));
        assert!(a.estadisticas.is_empty());
    }

    #[test]
    fn test_simulation_response_skips_null_values() {
        let resp: SimulationResponse = serde_json::from_str(
            r#"{"estadisticas": {"ventas": {"value": 10, "max": 20}, "margen": {"value": null, "max": 1}}}"#,
        )
        .unwrap();
        let stats = resp.statistics();
        assert_eq!(stats.len(), 1);
        assert_eq!(stats["ventas"].value, 10.0);
    }

    #[test]
    fn test_social_links_routing() {
        let form = UploadForm {
            company_name: "Panadería Sol".to_string(),
            social_url: Some("https://www.instagram.com/panaderiasol".to_string()),
            facebook_url: Some("https://facebook.com/panaderiasol".to_string()),
            ..Default::default()
        };
        let links = form.social_links();
        assert_eq!(
            links.instagram.as_deref(),
            Some("https://www.instagram.com/panaderiasol")
        );
        assert_eq!(
            links.facebook.as_deref(),
            Some("https://facebook.com/panaderiasol")
        );
        assert!(links.tiktok.is_none());
    }

    #[test]
    fn test_upload_form_validation() {
        let empty = UploadForm::default();
        assert!(empty.validate().is_err());

        let file = UploadFile {
            file_name: "balance.pdf".to_string(),
            content_type: Some("application/pdf".to_string()),
            bytes: vec![1, 2, 3],
        };
        let too_many = UploadForm {
            company_name: "ACME".to_string(),
            financial_files: vec![file; 4],
            ..Default::default()
        };
        assert!(too_many.validate().is_err());
        assert_eq!(too_many.trade_name_or_company(), "ACME");
    }
}
