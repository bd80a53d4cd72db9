//! Distribute-with-refill planning.
//!
//! One tip serves every destination. The tip is filled to `fill` usable
//! microlitres plus a `reserve` cushion that is never dispensed into a
//! destination. Before each request the planner decides between
//! [`RefillDecision::Sufficient`] and [`RefillDecision::NeedsRefill`]; a
//! refill tops the usable volume back up to `fill`. Requests are never split
//! across two tip loads.

use lh_core::{LhError, Volume, WellId};
use serde::{Deserialize, Serialize};

use crate::instrument::{PipetteModel, VOLUME_EPSILON};

/// Fill and reserve volumes for a distribute run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RefillPolicy {
    fill_ul: f64,
    reserve_ul: f64,
}

impl RefillPolicy {
    /// Validates the policy against the pipette that will carry it out.
    pub fn new(fill_ul: f64, reserve_ul: f64, pipette: &PipetteModel) -> Result<Self, LhError> {
        if !fill_ul.is_finite() || fill_ul <= 0.0 {
            return Err(LhError::configuration(
                "lh_exec.fill_volume",
                "distribute fill volume must be positive",
            )
            .with_context("fill", fill_ul.to_string()));
        }
        if !reserve_ul.is_finite() || reserve_ul < 0.0 {
            return Err(LhError::configuration(
                "lh_exec.reserve_volume",
                "distribute reserve volume must be zero or positive",
            )
            .with_context("reserve", reserve_ul.to_string()));
        }
        if fill_ul + reserve_ul > pipette.max_volume_ul + VOLUME_EPSILON {
            return Err(LhError::configuration(
                "lh_exec.fill_exceeds_capacity",
                "fill plus reserve volume exceeds pipette capacity",
            )
            .with_context("fill", fill_ul.to_string())
            .with_context("reserve", reserve_ul.to_string())
            .with_context("capacity", pipette.max_volume_ul.to_string())
            .with_context("pipette", pipette.name.clone()));
        }
        Ok(Self {
            fill_ul,
            reserve_ul,
        })
    }

    /// Usable volume after every (re)fill.
    pub fn fill_ul(&self) -> f64 {
        self.fill_ul
    }

    /// Cushion kept in the tip for the whole run.
    pub fn reserve_ul(&self) -> f64 {
        self.reserve_ul
    }

    /// Volume aspirated right after tip pickup.
    pub fn initial_aspirate_ul(&self) -> f64 {
        self.fill_ul + self.reserve_ul
    }

    /// Decides whether `volume_in_tip` covers `request`. Equality is sufficient.
    pub fn decide(&self, volume_in_tip: f64, request: Volume) -> RefillDecision {
        if volume_in_tip + VOLUME_EPSILON >= request.as_ul() {
            RefillDecision::Sufficient
        } else {
            RefillDecision::NeedsRefill {
                top_up_ul: self.fill_ul - volume_in_tip,
            }
        }
    }
}

/// Outcome of checking the tip before a dispense.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "kebab-case")]
pub enum RefillDecision {
    /// The usable volume covers the request.
    Sufficient,
    /// Aspirate `top_up_ul` from the source first, restoring the full fill.
    NeedsRefill { top_up_ul: f64 },
}

/// One destination in a distribute plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributeStep {
    pub destination: WellId,
    pub volume: Volume,
    pub decision: RefillDecision,
    /// Usable volume left in the tip after this dispense.
    pub remaining_ul: f64,
}

/// Pre-computed sequence of refill decisions for a distribute run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributePlan {
    pub policy: RefillPolicy,
    pub steps: Vec<DistributeStep>,
}

impl DistributePlan {
    /// Number of refills after the initial fill.
    pub fn refill_count(&self) -> usize {
        self.steps
            .iter()
            .filter(|step| matches!(step.decision, RefillDecision::NeedsRefill { .. }))
            .count()
    }

    /// Total volume drawn from the source, including the initial fill and reserve.
    pub fn source_volume_ul(&self) -> f64 {
        let top_ups: f64 = self
            .steps
            .iter()
            .map(|step| match step.decision {
                RefillDecision::Sufficient => 0.0,
                RefillDecision::NeedsRefill { top_up_ul } => top_up_ul,
            })
            .sum();
        self.policy.initial_aspirate_ul() + top_ups
    }

    /// 1-based rows whose refill top-up is below `min_ul`.
    pub fn top_ups_below(&self, min_ul: f64) -> Vec<usize> {
        self.steps
            .iter()
            .enumerate()
            .filter_map(|(index, step)| match step.decision {
                RefillDecision::NeedsRefill { top_up_ul } if top_up_ul + VOLUME_EPSILON < min_ul => {
                    Some(index + 1)
                }
                _ => None,
            })
            .collect()
    }

    /// Usable volume left after the last dispense.
    pub fn final_remaining_ul(&self) -> f64 {
        self.steps
            .last()
            .map(|step| step.remaining_ul)
            .unwrap_or(self.policy.fill_ul)
    }
}

/// Plans a distribute run over `requests` in order.
///
/// Fails before any physical action when a single request exceeds the fill
/// volume, since requests are never split across tip loads.
pub fn plan_distribute(
    requests: &[(WellId, Volume)],
    policy: RefillPolicy,
) -> Result<DistributePlan, LhError> {
    if let Some((index, (well, volume))) = requests
        .iter()
        .enumerate()
        .find(|(_, (_, volume))| volume.as_ul() > policy.fill_ul + VOLUME_EPSILON)
    {
        return Err(LhError::configuration(
            "lh_exec.request_exceeds_fill",
            "requested volume exceeds the distribute fill volume",
        )
        .with_context("row", (index + 1).to_string())
        .with_context("destination", well.to_string())
        .with_context("volume", volume.as_ul().to_string())
        .with_context("fill", policy.fill_ul.to_string()));
    }

    let mut volume_in_tip = policy.fill_ul;
    let mut steps = Vec::with_capacity(requests.len());
    for (well, volume) in requests {
        let decision = policy.decide(volume_in_tip, *volume);
        if let RefillDecision::NeedsRefill { .. } = decision {
            volume_in_tip = policy.fill_ul;
        }
        volume_in_tip = (volume_in_tip - volume.as_ul()).max(0.0);
        debug_assert!(volume_in_tip <= policy.fill_ul + VOLUME_EPSILON);
        steps.push(DistributeStep {
            destination: *well,
            volume: *volume,
            decision,
            remaining_ul: volume_in_tip,
        });
    }
    Ok(DistributePlan { policy, steps })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p300() -> PipetteModel {
        PipetteModel::lookup("p300_single_gen2").unwrap()
    }

    #[test]
    fn equality_is_sufficient() {
        let policy = RefillPolicy::new(200.0, 0.0, &p300()).unwrap();
        let request = Volume::new(90.0).unwrap();
        assert_eq!(policy.decide(90.0, request), RefillDecision::Sufficient);
        assert_eq!(
            policy.decide(89.5, request),
            RefillDecision::NeedsRefill { top_up_ul: 110.5 }
        );
    }

    #[test]
    fn reserve_counts_against_capacity() {
        assert!(RefillPolicy::new(280.0, 20.0, &p300()).is_ok());
        let err = RefillPolicy::new(290.0, 20.0, &p300()).unwrap_err();
        assert_eq!(err.info().code, "lh_exec.fill_exceeds_capacity");
    }
}
