//! Deterministic stand-in for the external analyzer.
//!
//! Used when no analyzer URL is configured and as the fixture seam in tests.
//! The heuristic mirrors the analyzer's demo score so that offline results
//! have the same shape and the same risk bands as real ones.

use crate::models::*;
use std::collections::BTreeMap;

pub const SALES_KEY: &str = "ventas_anuales";
pub const GROSS_MARGIN_KEY: &str = "margen_bruto";
pub const CURRENT_RATIO_KEY: &str = "razon_corriente";
pub const DEBT_TO_ASSETS_KEY: &str = "deuda_total_activos";
pub const OPERATING_CASH_FLOW_KEY: &str = "flujo_caja_operativo";

/// Reference maxima the analyzer reports alongside each statistic.
pub const REFERENCE_MAXIMA: [(&str, f64); 5] = [
    (SALES_KEY, 50_000_000.0),
    (GROSS_MARGIN_KEY, 1.0),
    (CURRENT_RATIO_KEY, 5.0),
    (DEBT_TO_ASSETS_KEY, 1.0),
    (OPERATING_CASH_FLOW_KEY, 10_000_000.0),
];

/// Financial metrics extracted from a company's statements.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FinanceMetrics {
    pub annual_sales: f64,
    pub gross_margin: f64,
    pub current_ratio: f64,
    pub debt_to_assets: f64,
    pub operating_cash_flow: f64,
}

impl Default for FinanceMetrics {
    /// Values the analyzer falls back to when nothing could be extracted.
    fn default() -> Self {
        Self {
            annual_sales: 0.0,
            gross_margin: 0.22,
            current_ratio: 1.2,
            debt_to_assets: 0.6,
            operating_cash_flow: 0.0,
        }
    }
}

impl FinanceMetrics {
    /// Metrics the simulator assumes for a given annual income.
    pub fn simulated(annual_sales: f64) -> Self {
        Self {
            annual_sales,
            gross_margin: 0.25,
            current_ratio: 1.5,
            debt_to_assets: 0.5,
            operating_cash_flow: annual_sales * 0.15,
        }
    }

    fn value_of(&self, key: &str) -> f64 {
        match key {
            SALES_KEY => self.annual_sales,
            GROSS_MARGIN_KEY => self.gross_margin,
            CURRENT_RATIO_KEY => self.current_ratio,
            DEBT_TO_ASSETS_KEY => self.debt_to_assets,
            OPERATING_CASH_FLOW_KEY => self.operating_cash_flow,
            _ => 0.0,
        }
    }

    /// Statistics in the analyzer's wire shape.
    pub fn statistics(&self) -> BTreeMap<String, RawStatistic> {
        REFERENCE_MAXIMA
            .iter()
            .map(|(key, max)| {
                (
                    key.to_string(),
                    RawStatistic {
                        value: Some(self.value_of(key)),
                        max: Some(*max),
                    },
                )
            })
            .collect()
    }
}

/// Inputs to the heuristic score.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreInput {
    pub age_months: u32,
    /// Digital rating on a 0..5 scale, `None` without social profiles.
    pub digital_rating: Option<f64>,
    /// Average payment delay in days for each trade reference.
    pub reference_delays: Vec<f64>,
    pub finance: FinanceMetrics,
}

/// Direction of a scoring factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FactorSign {
    Positive,
    Neutral,
    Negative,
}

impl FactorSign {
    pub fn marker(&self) -> &'static str {
        match self {
            FactorSign::Positive => "+",
            FactorSign::Neutral => "±",
            FactorSign::Negative => "-",
        }
    }

    fn priority(&self) -> u8 {
        match self {
            FactorSign::Negative => 0,
            FactorSign::Neutral => 1,
            FactorSign::Positive => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoreOutcome {
    pub score: f64,
    /// "Bajo", "Medio" or "Alto".
    pub risk: &'static str,
    pub amount: AmountRange,
    pub factors: Vec<(String, FactorSign)>,
}

impl ScoreOutcome {
    /// Up to five factors, negatives first, as the analyzer ranks them.
    pub fn top_factors(&self) -> Vec<(String, FactorSign)> {
        let mut ranked = self.factors.clone();
        ranked.sort_by_key(|(_, sign)| sign.priority());
        ranked.truncate(5);
        ranked
    }
}

/// Combines financial, digital and reference signals into a 0..0.99 score.
pub fn compute_score(input: &ScoreInput) -> ScoreOutcome {
    let fin = &input.finance;
    let mut score: f64 = 0.0;
    let mut factors = Vec::new();
    let mut factor = |label: &str, sign: FactorSign| factors.push((label.to_string(), sign));

    let rc = fin.current_ratio;
    if rc >= 2.0 {
        score += 0.30;
        factor("Liquidez (RC≥2.0)", FactorSign::Positive);
    } else if rc >= 1.5 {
        score += 0.22;
        factor("Liquidez (RC 1.5-2.0)", FactorSign::Positive);
    } else if rc >= 1.0 {
        score += 0.12;
        factor("Liquidez (RC 1.0-1.5)", FactorSign::Neutral);
    } else {
        score += 0.04;
        factor("Liquidez (RC<1.0)", FactorSign::Negative);
    }

    let mg = fin.gross_margin;
    if mg >= 0.35 {
        score += 0.18;
        factor("Margen bruto (≥35%)", FactorSign::Positive);
    } else if mg >= 0.25 {
        score += 0.12;
        factor("Margen bruto (25-35%)", FactorSign::Positive);
    } else if mg >= 0.15 {
        score += 0.07;
        factor("Margen bruto (15-25%)", FactorSign::Neutral);
    } else {
        score += 0.03;
        factor("Margen bruto (<15%)", FactorSign::Negative);
    }

    let dta = fin.debt_to_assets;
    if dta <= 0.40 {
        score += 0.15;
        factor("Apalancamiento (≤40%)", FactorSign::Positive);
    } else if dta <= 0.60 {
        score += 0.08;
        factor("Apalancamiento (40-60%)", FactorSign::Neutral);
    } else {
        score += 0.03;
        factor("Apalancamiento (>60%)", FactorSign::Negative);
    }

    let fco = fin.operating_cash_flow;
    if fco > 0.0 {
        score += 0.12;
        factor("Flujo operativo (+)", FactorSign::Positive);
    } else {
        score += 0.04;
        factor("Flujo operativo (−)", FactorSign::Negative);
    }

    if let Some(rating) = input.digital_rating {
        score += (rating / 5.0 * 0.10).clamp(0.0, 0.10);
        let sign = if rating >= 4.0 {
            FactorSign::Positive
        } else {
            FactorSign::Neutral
        };
        factor("Reputación digital", sign);
    }

    score += (input.age_months as f64 / 120.0).min(0.10);
    let age_sign = if input.age_months >= 24 {
        FactorSign::Positive
    } else {
        FactorSign::Neutral
    };
    factor("Antigüedad", age_sign);

    if !input.reference_delays.is_empty() {
        let avg_delay =
            input.reference_delays.iter().sum::<f64>() / input.reference_delays.len() as f64;
        if avg_delay <= 5.0 {
            score += 0.08;
            factor("Disciplina de pago (≤5 días)", FactorSign::Positive);
        } else if avg_delay <= 15.0 {
            score += 0.04;
            factor("Disciplina de pago (6-15 días)", FactorSign::Neutral);
        } else {
            score += 0.01;
            factor("Disciplina de pago (>15 días)", FactorSign::Negative);
        }
    }

    let score = (score.min(0.99) * 100.0).round() / 100.0;
    let risk = if score >= 0.75 {
        "Bajo"
    } else if score >= 0.55 {
        "Medio"
    } else {
        "Alto"
    };

    ScoreOutcome {
        score,
        risk,
        amount: suggested_amount(fin),
        factors,
    }
}

/// Credit range derived from sales, capped by operating cash-flow and
/// penalized for leverage and tight liquidity.
fn suggested_amount(fin: &FinanceMetrics) -> AmountRange {
    let rc = fin.current_ratio;
    let sales = fin.annual_sales.max(0.0);
    let sales_share: f64 = if rc < 1.0 { 0.10 } else { 0.20 };
    let base_from_sales = sales_share * sales;
    let cash_flow_cap = 0.40 * fin.operating_cash_flow.max(0.0);

    let gross = if cash_flow_cap > 0.0 {
        base_from_sales.min(cash_flow_cap)
    } else {
        base_from_sales * 0.50
    };

    let mut penalty: f64 = 1.0;
    if fin.debt_to_assets > 0.80 {
        penalty *= 0.60;
    } else if fin.debt_to_assets > 0.65 {
        penalty *= 0.80;
    }
    if rc < 1.0 {
        penalty *= 0.90;
    }

    let max = (gross * penalty).max(0.0);
    AmountRange {
        min: round_to_hundreds(0.25 * max),
        max: round_to_hundreds(max),
    }
}

fn round_to_hundreds(x: f64) -> f64 {
    (x / 100.0).round() * 100.0
}

/// Simulation answered locally: same metrics and score the analyzer's
/// simulate endpoint derives from the three parameters.
pub fn simulate(params: &SimulationParameters) -> SimulationResponse {
    let sales = params.income_units();
    let digital_rating = (params.reputation * 5.0 / 100.0).clamp(0.0, 5.0);
    let delay_days = (30.0 - params.on_time_payment * 30.0 / 100.0).max(0.0).round();

    let finance = FinanceMetrics::simulated(sales);
    let outcome = compute_score(&ScoreInput {
        age_months: 36,
        digital_rating: Some(digital_rating),
        reference_delays: vec![delay_days],
        finance,
    });

    SimulationResponse {
        estadisticas: finance.statistics(),
        nivel_riesgo: Some(outcome.risk.to_string()),
        score: Some(outcome.score),
        monto_sugerido: Some(outcome.amount),
    }
}

/// Decision for a company whose documents could not be analyzed: default
/// metrics, no digital signals.
pub fn fixture_decision(form: &UploadForm) -> RawDecisionEnvelope {
    let finance = FinanceMetrics::default();
    let outcome = compute_score(&ScoreInput {
        age_months: 36,
        digital_rating: None,
        reference_delays: Vec::new(),
        finance,
    });

    let trade_name = form.trade_name_or_company().to_string();
    let top_5 = outcome
        .top_factors()
        .into_iter()
        .map(|(label, sign)| {
            RawFactor::Group(vec![
                serde_json::Value::String(label),
                serde_json::Value::String(sign.marker().to_string()),
            ])
        })
        .collect();

    let parrafo_1 = format!(
        "Se sugiere un crédito de USD {:.0} para {} ({}), clasificada como riesgo {}.",
        outcome.amount.max, form.company_name, trade_name, outcome.risk
    );
    let parrafo_2 = "Evaluación generada sin conexión con el analizador: los indicadores \
                     financieros corresponden a valores por defecto y deben validarse con \
                     los estados financieros de la empresa."
        .to_string();

    RawDecisionEnvelope {
        schema_version: DECISION_SCHEMA_VERSION,
        decision: Some(RawDecision {
            empresa: Some(RawCompany {
                razon_social: Some(form.company_name.clone()),
                nombre_comercial: Some(trade_name),
            }),
            riesgo: Some(outcome.risk.to_string()),
            credito_sugerido: Some(RawCredit {
                monto: Some(outcome.amount.max),
                moneda: Some("USD".to_string()),
            }),
            factores_clave_riesgo: Some(RawKeyFactors { top_5 }),
            estadisticas: finance.statistics(),
            resumen: Some(RawSummary {
                parrafo_1: Some(parrafo_1),
                parrafo_2: Some(parrafo_2),
            }),
        }),
    }
}
