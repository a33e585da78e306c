//! Turns analyzer decisions into the snapshot every page renders.
//!
//! The normalizer never writes anything: callers store the returned
//! [`Normalized`] in the session only after it has been fully built, so a bad
//! payload cannot leave half-written state behind.

use crate::errors::AppError;
use crate::models::*;

/// Sign markers the analyzer attaches to `[label, sign]` factor pairs.
const SIGN_MARKERS: [&str; 3] = ["+", "-", "±"];

/// Result of normalizing one decision.
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    pub snapshot: ScoringSnapshot,
    /// Pre-mapping statistics, original lowercase keys.
    pub statistics: RawStatistics,
}

/// Parses the analyzer's JSON body.
pub fn parse_decision(body: &str) -> Result<RawDecisionEnvelope, AppError> {
    serde_json::from_str(body).map_err(|e| {
        AppError::MalformedPayload(format!("Failed to parse evaluation response: {}", e))
    })
}

/// Builds a [`ScoringSnapshot`] and its [`RawStatistics`] from a decision envelope.
pub fn normalize(raw: &RawDecisionEnvelope) -> Result<Normalized, AppError> {
    if raw.schema_version != DECISION_SCHEMA_VERSION {
        return Err(AppError::MalformedPayload(format!(
            "unsupported decision schema version {}",
            raw.schema_version
        )));
    }

    let decision = raw
        .decision
        .as_ref()
        .ok_or_else(|| AppError::MalformedPayload("missing 'decision' object".to_string()))?;

    let risk_label = decision
        .riesgo
        .as_deref()
        .ok_or_else(|| AppError::MalformedPayload("missing risk level".to_string()))?;
    let risk_level = RiskLevel::from_label(risk_label);
    if risk_level == RiskLevel::Unknown {
        tracing::warn!("Unrecognized risk level from analyzer: {:?}", risk_label);
    }

    let credit = decision
        .credito_sugerido
        .as_ref()
        .ok_or_else(|| AppError::MalformedPayload("missing 'credito_sugerido'".to_string()))?;
    let amount = credit
        .monto
        .ok_or_else(|| AppError::MalformedPayload("missing 'credito_sugerido.monto'".to_string()))?;

    let summary = join_summary(decision.resumen.as_ref())?;
    let statistics = statistics_from_wire(decision);
    let risk_factors = risk_factors(&statistics);
    let key_factors = decision
        .factores_clave_riesgo
        .as_ref()
        .map(|f| flatten_key_factors(&f.top_5))
        .unwrap_or_default();

    let snapshot = ScoringSnapshot {
        risk_level,
        credit_suggested: clamp_amount(amount),
        currency: credit
            .moneda
            .clone()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| "USD".to_string()),
        key_factors,
        risk_factors,
        summary,
    };

    tracing::debug!(
        "Normalized decision: risk={:?}, credit={}, factors={}",
        snapshot.risk_level,
        snapshot.credit_suggested,
        snapshot.risk_factors.len()
    );

    Ok(Normalized {
        snapshot,
        statistics,
    })
}

/// One risk factor per statistic, in key order.
pub fn risk_factors(statistics: &RawStatistics) -> Vec<RiskFactor> {
    statistics
        .iter()
        .map(|(key, stat)| RiskFactor {
            subject: capitalize(key),
            value: stat.value,
            max_value: stat.max,
        })
        .collect()
}

/// Upper-cases the first character, leaving the rest untouched.
pub fn capitalize(key: &str) -> String {
    let mut chars = key.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Inverse of [`capitalize`] for lookups: lowercase with whitespace removed.
pub fn subject_key(subject: &str) -> String {
    subject
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

fn statistics_from_wire(decision: &RawDecision) -> RawStatistics {
    decision
        .estadisticas
        .iter()
        .map(|(key, stat)| {
            (
                key.clone(),
                Statistic {
                    value: stat.value.unwrap_or(0.0),
                    max: stat.max.unwrap_or(0.0),
                },
            )
        })
        .collect()
}

fn join_summary(resumen: Option<&RawSummary>) -> Result<String, AppError> {
    let resumen =
        resumen.ok_or_else(|| AppError::MalformedPayload("missing 'resumen'".to_string()))?;
    let first = resumen
        .parrafo_1
        .as_deref()
        .ok_or_else(|| AppError::MalformedPayload("missing 'resumen.parrafo_1'".to_string()))?;
    let second = resumen
        .parrafo_2
        .as_deref()
        .ok_or_else(|| AppError::MalformedPayload("missing 'resumen.parrafo_2'".to_string()))?;
    Ok(format!("{}\n\n{}", first, second))
}

fn flatten_key_factors(top: &[RawFactor]) -> Vec<String> {
    let mut factors = Vec::new();
    for factor in top {
        match factor {
            RawFactor::Label(label) => factors.push(label.trim().to_string()),
            RawFactor::Group(items) => factors.extend(
                items
                    .iter()
                    .filter_map(|v| v.as_str())
                    .map(|s| s.trim().to_string())
                    .filter(|s| !SIGN_MARKERS.contains(&s.as_str())),
            ),
        }
    }
    factors.retain(|f| !f.is_empty());
    factors
}

fn clamp_amount(amount: f64) -> f64 {
    if amount.is_finite() && amount > 0.0 {
        amount
    } else {
        0.0
    }
}
