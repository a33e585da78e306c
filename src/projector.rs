//! What-if projections over the baseline risk factors.
//!
//! A projection re-keys each baseline factor against the statistics of a
//! simulation response. The last [`HISTORY_CAPACITY`] runs are kept, newest
//! first, for the comparison chart.

use crate::backend::ScoringBackend;
use crate::errors::AppError;
use crate::models::{
    AmountRange, RawStatistics, RiskFactor, RiskLevel, SimulationParameters, SimulationRun,
};
use crate::normalizer::subject_key;
use chrono::Utc;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

pub const HISTORY_CAPACITY: usize = 3;

/// Projected values plus the subjects the response did not cover.
#[derive(Debug, Clone, PartialEq)]
pub struct Projection {
    pub values: Vec<f64>,
    /// Subjects that kept their baseline value.
    pub missing: Vec<String>,
}

/// Values aligned with `baseline`; subjects missing from `statistics` keep
/// their baseline value.
pub fn project(baseline: &[RiskFactor], statistics: &RawStatistics) -> Vec<f64> {
    project_detailed(baseline, statistics).values
}

pub fn project_detailed(baseline: &[RiskFactor], statistics: &RawStatistics) -> Projection {
    let mut missing = Vec::new();
    let values = baseline
        .iter()
        .map(|factor| match statistics.get(&subject_key(&factor.subject)) {
            Some(stat) => stat.value,
            None => {
                missing.push(factor.subject.clone());
                factor.value
            }
        })
        .collect();

    if !missing.is_empty() {
        tracing::debug!("Simulation kept baseline values for {:?}", missing);
    }

    Projection { values, missing }
}

/// Bounded newest-first list of runs.
#[derive(Debug, Clone, Default)]
pub struct SimulationHistory {
    runs: VecDeque<SimulationRun>,
    started: u64,
    generation: u64,
}

impl SimulationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prepends `run`, evicting the oldest entry beyond capacity.
    pub fn push_run(&mut self, run: SimulationRun) -> Vec<SimulationRun> {
        self.runs.push_front(run);
        self.runs.truncate(HISTORY_CAPACITY);
        self.runs()
    }

    pub fn runs(&self) -> Vec<SimulationRun> {
        self.runs.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.runs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    fn reset(&mut self) {
        self.runs.clear();
        self.started = 0;
        self.generation += 1;
    }
}

/// Outcome of one simulation, as returned to the simulation page.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationOutcome {
    pub run: SimulationRun,
    pub history: Vec<SimulationRun>,
    pub missing_subjects: Vec<String>,
    pub suggested_amount: Option<AmountRange>,
    pub score: Option<f64>,
}

/// Runs simulations for one session, one at a time.
#[derive(Debug, Default)]
pub struct Simulator {
    history: Mutex<SimulationHistory>,
    in_flight: Mutex<Option<Uuid>>,
}

/// Releases the in-flight slot when the run finishes, whatever the outcome.
struct InFlightGuard<'a> {
    slot: &'a Mutex<Option<Uuid>>,
    token: Uuid,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if *slot == Some(self.token) {
            *slot = None;
        }
    }
}

impl Simulator {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_history(&self) -> MutexGuard<'_, SimulationHistory> {
        self.history.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn begin(&self) -> Result<InFlightGuard<'_>, AppError> {
        let mut slot = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(pending) = *slot {
            tracing::warn!("Rejecting simulation while request {} is pending", pending);
            return Err(AppError::SimulationInFlight);
        }
        let token = Uuid::new_v4();
        *slot = Some(token);
        Ok(InFlightGuard {
            slot: &self.in_flight,
            token,
        })
    }

    pub fn is_running(&self) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    pub fn history(&self) -> Vec<SimulationRun> {
        self.lock_history().runs()
    }

    /// Starts a fresh page visit: previous runs are discarded.
    pub fn reset(&self) {
        self.lock_history().reset();
    }

    /// Asks `backend` for a projection of `baseline` under `params`.
    ///
    /// On failure the history is left as it was and the error is returned.
    pub async fn run(
        &self,
        backend: &ScoringBackend,
        baseline: &[RiskFactor],
        params: SimulationParameters,
        label: Option<String>,
    ) -> Result<SimulationOutcome, AppError> {
        params.validate()?;
        let guard = self.begin()?;

        // Label is fixed at start so a run outliving its visit keeps that visit's ordinal
        let (generation, label) = {
            let history = self.lock_history();
            let label = label
                .filter(|l| !l.trim().is_empty())
                .unwrap_or_else(|| format!("Simulación {}", history.started + 1));
            (history.generation, label)
        };
        tracing::info!("Simulation '{}' started (request {})", label, guard.token);

        let response = backend.submit_simulation(&params).await.map_err(|e| {
            tracing::warn!("Simulation request {} failed: {}", guard.token, e);
            e
        })?;

        let raw_risk_level = response.nivel_riesgo.clone().ok_or_else(|| {
            AppError::MalformedPayload("simulation response has no risk level".to_string())
        })?;

        let projection = project_detailed(baseline, &response.statistics());

        let (run, history) = {
            let mut history = self.lock_history();
            let stale = history.generation != generation;
            if !stale {
                history.started += 1;
            }
            let run = SimulationRun {
                label,
                projected_values: projection.values,
                risk_level: RiskLevel::from_label(&raw_risk_level),
                raw_risk_level,
                parameters: params,
                created_at: Utc::now(),
            };
            if stale {
                tracing::debug!("Discarding simulation {} from a previous visit", guard.token);
                let runs = history.runs();
                (run, runs)
            } else {
                let runs = history.push_run(run.clone());
                (run, runs)
            }
        };

        drop(guard);
        Ok(SimulationOutcome {
            run,
            history,
            missing_subjects: projection.missing,
            suggested_amount: response.monto_sugerido,
            score: response.score,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Statistic;

    fn factor(subject: &str, value: f64) -> RiskFactor {
        RiskFactor {
            subject: subject.to_string(),
            value,
            max_value: 150.0,
        }
    }

    fn run(label: &str) -> SimulationRun {
        SimulationRun {
            label: label.to_string(),
            projected_values: vec![1.0],
            risk_level: RiskLevel::Medium,
            raw_risk_level: "Medio".to_string(),
            parameters: SimulationParameters::default(),
            created_at: Utc::now(),
        }
    }

    fn labels(runs: &[SimulationRun]) -> Vec<&str> {
        runs.iter().map(|r| r.label.as_str()).collect()
    }

    #[test]
    fn test_project_uses_remote_values_and_keeps_missing() {
        let baseline = vec![factor("Ventas", 120.0), factor("Reputación", 98.0)];
        let mut stats = RawStatistics::new();
        stats.insert(
            "ventas".to_string(),
            Statistic {
                value: 140.0,
                max: 150.0,
            },
        );

        let projection = project_detailed(&baseline, &stats);
        assert_eq!(projection.values, vec![140.0, 98.0]);
        assert_eq!(projection.missing, vec!["Reputación"]);
        assert_eq!(project(&baseline, &RawStatistics::new()), vec![120.0, 98.0]);
    }

    #[test]
    fn test_history_eviction() {
        let mut history = SimulationHistory::new();
        history.push_run(run("run1"));
        history.push_run(run("run2"));
        let three = history.push_run(run("run3"));
        assert_eq!(labels(&three), vec!["run3", "run2", "run1"]);

        let four = history.push_run(run("run4"));
        assert_eq!(labels(&four), vec!["run4", "run3", "run2"]);
        assert_eq!(history.len(), HISTORY_CAPACITY);
    }

    #[tokio::test]
    async fn test_offline_run_records_history() {
        let simulator = Simulator::new();
        let baseline = vec![factor("Ventas_anuales", 0.0), factor("Activos", 85.0)];

        let outcome = simulator
            .run(
                &ScoringBackend::Offline,
                &baseline,
                SimulationParameters {
                    income: 100.0,
                    reputation: 80.0,
                    on_time_payment: 100.0,
                },
                None,
            )
            .await
            .unwrap();

        assert_eq!(outcome.run.label, "Simulación 1");
        assert_eq!(outcome.run.projected_values, vec![100_000.0, 85.0]);
        assert_eq!(outcome.run.risk_level, RiskLevel::Low);
        assert_eq!(outcome.missing_subjects, vec!["Activos"]);
        assert_eq!(simulator.history().len(), 1);
        assert!(!simulator.is_running());
    }

    #[tokio::test]
    async fn test_invalid_parameters_leave_history_untouched() {
        let simulator = Simulator::new();
        let err = simulator
            .run(
                &ScoringBackend::Offline,
                &[],
                SimulationParameters {
                    reputation: -5.0,
                    ..Default::default()
                },
                None,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::BadRequest(_)));
        assert!(simulator.history().is_empty());
    }

    #[test]
    fn test_second_run_rejected_while_in_flight() {
        let simulator = Simulator::new();
        let guard = simulator.begin().unwrap();
        assert!(matches!(
            simulator.begin(),
            Err(AppError::SimulationInFlight)
        ));
        drop(guard);
        assert!(simulator.begin().is_ok());
    }

    #[tokio::test]
    async fn test_reset_clears_history_and_numbering() {
        let simulator = Simulator::new();
        for _ in 0..2 {
            simulator
                .run(
                    &ScoringBackend::Offline,
                    &[],
                    SimulationParameters::default(),
                    None,
                )
                .await
                .unwrap();
        }
        assert_eq!(simulator.history().len(), 2);

        simulator.reset();
        assert!(simulator.history().is_empty());

        let outcome = simulator
            .run(
                &ScoringBackend::Offline,
                &[],
                SimulationParameters::default(),
                Some("Escenario optimista".to_string()),
            )
            .await
            .unwrap();
        assert_eq!(outcome.run.label, "Escenario optimista");
        assert_eq!(labels(&outcome.history), vec!["Escenario optimista"]);
    }
}
