/// Property-based tests using proptest
/// Tests invariants of the normalizer, projector and session cache
use chrono::Utc;
use proptest::prelude::*;
use pyme_scoring::models::{
    RawDecisionEnvelope, RawStatistics, RiskLevel, SimulationParameters, SimulationRun, Statistic,
};
use pyme_scoring::normalizer::{normalize, risk_factors};
use pyme_scoring::projector::{project, SimulationHistory, HISTORY_CAPACITY};
use pyme_scoring::session::SessionCache;
use std::collections::BTreeMap;

fn envelope(stats: &BTreeMap<String, (f64, f64)>, risk: &str) -> RawDecisionEnvelope {
    let estadisticas: serde_json::Map<String, serde_json::Value> = stats
        .iter()
        .map(|(k, (value, max))| (k.clone(), serde_json::json!({"value": value, "max": max})))
        .collect();
    serde_json::from_value(serde_json::json!({
        "decision": {
            "nivel_riesgo": risk,
            "credito_sugerido": {"monto": 1000},
            "estadisticas": estadisticas,
            "resumen": {"parrafo_1": "uno", "parrafo_2": "dos"}
        }
    }))
    .unwrap()
}

fn amount() -> impl Strategy<Value = f64> {
    // Two-decimal amounts, as the analyzer reports them
    (0u64..1_000_000_000).prop_map(|cents| cents as f64 / 100.0)
}

fn stats_strategy() -> impl Strategy<Value = BTreeMap<String, (f64, f64)>> {
    prop::collection::btree_map("[a-z_]{1,12}", (amount(), amount()), 1..8)
}

fn run(label: String) -> SimulationRun {
    SimulationRun {
        label,
        projected_values: Vec::new(),
        risk_level: RiskLevel::Unknown,
        raw_risk_level: String::new(),
        parameters: SimulationParameters::default(),
        created_at: Utc::now(),
    }
}

// Property: one risk factor per statistic, values copied verbatim
proptest! {
    #[test]
    fn risk_factors_match_statistics(stats in stats_strategy()) {
        let normalized = normalize(&envelope(&stats, "medio")).unwrap();
        let factors = &normalized.snapshot.risk_factors;

        prop_assert_eq!(factors.len(), stats.len());
        for (factor, (key, (value, max))) in factors.iter().zip(stats.iter()) {
            prop_assert_eq!(factor.value, *value);
            prop_assert_eq!(factor.max_value, *max);
            prop_assert_eq!(factor.subject.to_lowercase(), key.clone());
        }
        prop_assert_eq!(normalized.statistics.len(), stats.len());
    }

    #[test]
    fn risk_mapping_is_total(label in "\\PC*") {
        let level = RiskLevel::from_label(&label);
        let expected = match label.trim().to_lowercase().as_str() {
            "bajo" => RiskLevel::Low,
            "medio" => RiskLevel::Medium,
            "alto" => RiskLevel::High,
            _ => RiskLevel::Unknown,
        };
        prop_assert_eq!(level, expected);
    }

    #[test]
    fn known_labels_any_case(
        label in prop::sample::select(vec!["bajo", "medio", "alto"]),
        upper in prop::collection::vec(proptest::bool::ANY, 5)
    ) {
        let mixed: String = label
            .chars()
            .zip(upper.iter().cycle())
            .map(|(c, up)| if *up { c.to_ascii_uppercase() } else { c })
            .collect();
        prop_assert_ne!(RiskLevel::from_label(&mixed), RiskLevel::Unknown);
        prop_assert_eq!(RiskLevel::from_label(&mixed), RiskLevel::from_label(label));
    }
}

// Property: history keeps min(N, 3) runs, newest first
proptest! {
    #[test]
    fn history_is_bounded_and_newest_first(n in 0usize..20) {
        let mut history = SimulationHistory::new();
        for i in 0..n {
            history.push_run(run(format!("run{}", i + 1)));
        }

        let runs = history.runs();
        prop_assert_eq!(runs.len(), n.min(HISTORY_CAPACITY));
        for (offset, r) in runs.iter().enumerate() {
            prop_assert_eq!(r.label.clone(), format!("run{}", n - offset));
        }
    }
}

// Property: projection stays aligned with the baseline
proptest! {
    #[test]
    fn projection_aligned_with_baseline(
        baseline_stats in stats_strategy(),
        remote_stats in stats_strategy()
    ) {
        let baseline_raw: RawStatistics = baseline_stats
            .iter()
            .map(|(k, (value, max))| (k.clone(), Statistic { value: *value, max: *max }))
            .collect();
        let remote: RawStatistics = remote_stats
            .iter()
            .map(|(k, (value, max))| (k.clone(), Statistic { value: *value, max: *max }))
            .collect();

        let baseline = risk_factors(&baseline_raw);
        let projected = project(&baseline, &remote);

        prop_assert_eq!(projected.len(), baseline.len());
        for ((key, stat), value) in baseline_raw.iter().zip(projected.iter()) {
            match remote.get(key) {
                Some(r) => {
                    prop_assert_eq!(*value, r.value);
                }
                None => {
                    prop_assert_eq!(*value, stat.value);
                }
            }
        }
    }
}

// Property: session cache round-trip preserves the snapshot
proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn session_round_trip(stats in stats_strategy(), company in "[A-Za-zñáé ]{1,30}") {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let normalized = normalize(&envelope(&stats, "alto")).unwrap();

        let loaded = rt.block_on(async {
            let session = SessionCache::new(8);
            session.store_result(&company, &normalized).await.unwrap();
            session.load().await
        });

        let data = loaded.unwrap();
        prop_assert_eq!(data.snapshot, normalized.snapshot);
        prop_assert_eq!(data.statistics, normalized.statistics);
        prop_assert_eq!(data.company_name, company);
    }
}
