//! Gate runner.
//!
//! Two modes over the same gate list:
//!
//! - **sequential**: gates run in list order and the run stops at the first
//!   failure
//! - **tiered**: gates are grouped by [`Tier`]; every gate in a tier runs
//!   concurrently, all of that tier's results are kept, and later tiers run
//!   only if the whole tier passed

use std::collections::BTreeMap;
use std::time::Instant;

use futures::future::join_all;
use serde::{Deserialize, Serialize};

use crate::core::GateInput;
use crate::gates::{GateRef, QualityGateResult, Tier};

/// How a gate list is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    Sequential,
    #[default]
    Tiered,
}

impl std::fmt::Display for RunMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunMode::Sequential => write!(f, "sequential"),
            RunMode::Tiered => write!(f, "tiered"),
        }
    }
}

impl std::str::FromStr for RunMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sequential" => Ok(RunMode::Sequential),
            "tiered" => Ok(RunMode::Tiered),
            other => Err(format!("unknown run mode: '{}'", other)),
        }
    }
}

/// Result of one run over a gate list.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GateRunOutcome {
    /// Every executed gate passed.
    pub passed: bool,
    /// Results of the gates that ran, in execution order.
    pub results: Vec<QualityGateResult>,
    /// Names of the gates that failed.
    pub failed_gates: Vec<String>,
    /// Tier at which a tiered run stopped.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub halted_tier: Option<Tier>,
}

impl GateRunOutcome {
    fn from_results(results: Vec<QualityGateResult>, halted_tier: Option<Tier>) -> Self {
        let failed_gates: Vec<String> = results
            .iter()
            .filter(|r| !r.passed)
            .map(|r| r.gate_name.clone())
            .collect();
        Self {
            passed: failed_gates.is_empty(),
            results,
            failed_gates,
            halted_tier,
        }
    }

    /// The first failing gate, if any.
    pub fn failed_gate(&self) -> Option<&str> {
        self.failed_gates.first().map(String::as_str)
    }
}

async fn timed_check(gate: &GateRef, input: &GateInput) -> QualityGateResult {
    let start = Instant::now();
    let result = gate.check(input).await;
    let elapsed = start.elapsed().as_millis() as u64;

    tracing::debug!(
        gate = gate.name(),
        tier = %gate.tier(),
        passed = result.passed,
        elapsed_ms = elapsed,
        "gate checked"
    );

    if result.execution_time_ms.is_some() {
        result
    } else {
        result.with_execution_time(elapsed)
    }
}

/// Run gates in order, stopping at the first failure.
pub async fn run_gates(gates: &[GateRef], input: &GateInput) -> GateRunOutcome {
    let mut results = Vec::with_capacity(gates.len());
    for gate in gates {
        let result = timed_check(gate, input).await;
        let failed = !result.passed;
        results.push(result);
        if failed {
            break;
        }
    }
    GateRunOutcome::from_results(results, None)
}

/// Run gates tier by tier, each tier concurrently.
pub async fn run_gates_by_tier(gates: &[GateRef], input: &GateInput) -> GateRunOutcome {
    let mut tiers: BTreeMap<Tier, Vec<&GateRef>> = BTreeMap::new();
    for gate in gates {
        tiers.entry(gate.tier()).or_default().push(gate);
    }

    let mut results = Vec::with_capacity(gates.len());
    for (tier, tier_gates) in tiers {
        let tier_results = join_all(tier_gates.into_iter().map(|g| timed_check(g, input))).await;
        let tier_failed = tier_results.iter().any(|r| !r.passed);
        results.extend(tier_results);
        if tier_failed {
            return GateRunOutcome::from_results(results, Some(tier));
        }
    }
    GateRunOutcome::from_results(results, None)
}

/// Run gates in the given mode.
pub async fn run(mode: RunMode, gates: &[GateRef], input: &GateInput) -> GateRunOutcome {
    match mode {
        RunMode::Sequential => run_gates(gates, input).await,
        RunMode::Tiered => run_gates_by_tier(gates, input).await,
    }
}
