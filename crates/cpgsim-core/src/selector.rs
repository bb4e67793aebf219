use serde::{Deserialize, Serialize};

use crate::noise::ReplicateRng;
use crate::propensity::PropensityTensor;
use crate::reactions::ReactionTable;
use crate::{Methylation, Result, SimError, Time, F};

/// The reaction that fired in one replicate during one step.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub site: usize,
    pub reaction: usize,
}

/// Roulette-wheel selection: the first site whose cumulative propensity, in
/// site order, exceeds `draw`. Sites with zero propensity are never chosen;
/// a draw at or past the total falls back to the last eligible site.
pub fn select_site(site_totals: &[F], draw: F) -> Option<usize> {
    let mut cumulative = 0.0;
    let mut last_eligible = None;
    for (site, &propensity) in site_totals.iter().enumerate() {
        if propensity <= 0.0 {
            continue;
        }
        cumulative += propensity;
        last_eligible = Some(site);
        if cumulative > draw {
            return Some(site);
        }
    }
    last_eligible
}

/// Advances one replicate by a single event: waiting time, site, reaction,
/// then the state change. Draws are taken from `rng` in that order.
pub(crate) fn advance_replicate(
    table: &ReactionTable,
    tensor: &PropensityTensor,
    replicate: usize,
    step: usize,
    chain: &mut [Methylation],
    time: &mut Time,
    rng: &mut ReplicateRng,
) -> Result<Event> {
    let total = tensor.replicate_total(replicate);
    if !(total > 0.0) {
        return Err(SimError::DegeneratePropensity { replicate, step });
    }
    if !total.is_finite() {
        return Err(SimError::Configuration(format!(
            "total propensity of replicate {replicate} overflowed at step {step}"
        )));
    }

    let tau = rng.waiting_time(total);
    if !tau.is_finite() {
        return Err(SimError::Configuration(format!(
            "waiting time of replicate {replicate} is not finite at step {step} \
             (total propensity {total:e})"
        )));
    }
    *time += tau;

    let draw = rng.roulette(total);
    let site = select_site(tensor.site_totals(replicate), draw)
        .ok_or(SimError::DegeneratePropensity { replicate, step })?;

    let reaction = rng.categorical(tensor.site_rates(site, replicate))?;
    chain[site] = table.get(reaction).product;

    Ok(Event { site, reaction })
}
