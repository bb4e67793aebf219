use serde::{Deserialize, Serialize};

use crate::{Methylation, Result, SimError, F};
use Methylation::{Hemimethylated as H, Methylated as M, Unmethylated as U};

pub const NUM_REACTIONS: usize = 12;

/// Product level of each reaction, by index.
const PRODUCTS: [Methylation; NUM_REACTIONS] = [H, M, H, U, H, H, M, M, H, H, U, U];

/// Site level required by the neighbour-independent reactions 0..4.
const LOCAL_SITE_LEVELS: [Methylation; 4] = [U, H, M, H];

/// Kinetic constants of the nearest-neighbour model.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RateConstants {
    /// Base rate.
    pub a: F,
    /// Neighbour coupling multiplier.
    pub x: F,
    /// Hemimethylation multiplier.
    pub y: F,
}

impl RateConstants {
    pub fn new(a: F, x: F, y: F) -> Self {
        Self { a, x, y }
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in [("a", self.a), ("x", self.x), ("y", self.y)] {
            if !value.is_finite() || value < 0.0 {
                return Err(SimError::Configuration(format!(
                    "rate constant {name} must be finite and non-negative, got {value}"
                )));
            }
        }
        Ok(())
    }
}

/// What a reaction needs from the two neighbours of the firing site.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum NeighborRequirement {
    None,
    /// Left or right neighbour is at the given level. Sites without
    /// neighbours never satisfy this.
    Either(Methylation),
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Reaction {
    pub index: usize,
    pub rate: F,
    pub site: Methylation,
    pub neighbor: NeighborRequirement,
    pub product: Methylation,
}

impl Reaction {
    /// Whether the reaction can fire on a site at `site` level whose
    /// `(left, right)` neighbours are `neighbors`.
    pub fn is_applicable(
        &self,
        site: Methylation,
        neighbors: Option<(Methylation, Methylation)>,
    ) -> bool {
        if site != self.site {
            return false;
        }
        match self.neighbor {
            NeighborRequirement::None => true,
            NeighborRequirement::Either(target) => {
                matches!(neighbors, Some((left, right)) if left == target || right == target)
            }
        }
    }
}

/// The fixed 12-reaction table.
///
/// Indices 0..4 depend only on the site itself. Indices 4..12 act on
/// hemimethylated sites next to a neighbour at level `index / 4` (1 for 4..8,
/// 2 for 8..12); index parity nominally names the neighbour side, but either
/// side satisfies the requirement.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReactionTable {
    rates: RateConstants,
    reactions: Vec<Reaction>,
}

impl ReactionTable {
    pub fn new(rates: RateConstants) -> Result<Self> {
        rates.validate()?;
        let RateConstants { a, x, y } = rates;

        let reactions: Vec<Reaction> = (0..NUM_REACTIONS)
            .map(|index| {
                let (site, neighbor, rate) = if index < LOCAL_SITE_LEVELS.len() {
                    let rate = if index < 2 { a * y } else { a };
                    (LOCAL_SITE_LEVELS[index], NeighborRequirement::None, rate)
                } else {
                    let (target, rate) = if index < 8 { (H, a * x * y) } else { (M, a * x) };
                    (H, NeighborRequirement::Either(target), rate)
                };
                Reaction {
                    index,
                    rate,
                    site,
                    neighbor,
                    product: PRODUCTS[index],
                }
            })
            .collect();

        // products of finite constants can still overflow
        if let Some(reaction) = reactions.iter().find(|r| !r.rate.is_finite()) {
            return Err(SimError::Configuration(format!(
                "rate of reaction {} is not finite ({}) for a={a}, x={x}, y={y}",
                reaction.index, reaction.rate
            )));
        }

        Ok(Self { rates, reactions })
    }

    pub fn rates(&self) -> RateConstants {
        self.rates
    }

    pub fn get(&self, index: usize) -> &Reaction {
        &self.reactions[index]
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Reaction> {
        self.reactions.iter()
    }

    pub fn len(&self) -> usize {
        self.reactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reactions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use Methylation::*;

    fn table() -> ReactionTable {
        ReactionTable::new(RateConstants::new(2.0, 0.5, 0.25)).unwrap()
    }

    #[test]
    fn rates_follow_constants() {
        let t = table();
        let expected = [0.5, 0.5, 2.0, 2.0, 0.25, 0.25, 0.25, 0.25, 1.0, 1.0, 1.0, 1.0];
        assert_eq!(t.len(), NUM_REACTIONS);
        for (reaction, want) in t.iter().zip(expected) {
            assert_relative_eq!(reaction.rate, want);
        }
    }

    #[test]
    fn products_are_fixed() {
        let products: Vec<u8> = table().iter().map(|r| r.product.level()).collect();
        assert_eq!(products, vec![1, 2, 1, 0, 1, 1, 2, 2, 1, 1, 0, 0]);
    }

    #[test]
    fn local_reactions_check_only_the_site() {
        let t = table();
        assert!(t.get(0).is_applicable(Unmethylated, None));
        assert!(!t.get(0).is_applicable(Hemimethylated, None));
        assert!(t.get(1).is_applicable(Hemimethylated, None));
        assert!(t.get(2).is_applicable(Methylated, Some((Unmethylated, Unmethylated))));
        assert!(t.get(3).is_applicable(Hemimethylated, None));
    }

    #[test]
    fn neighbour_reactions_accept_either_side() {
        let t = table();
        for index in 4..8 {
            let r = t.get(index);
            assert!(r.is_applicable(Hemimethylated, Some((Hemimethylated, Unmethylated))));
            assert!(r.is_applicable(Hemimethylated, Some((Methylated, Hemimethylated))));
            assert!(!r.is_applicable(Hemimethylated, Some((Methylated, Unmethylated))));
            assert!(!r.is_applicable(Methylated, Some((Hemimethylated, Hemimethylated))));
        }
        for index in 8..12 {
            let r = t.get(index);
            assert!(r.is_applicable(Hemimethylated, Some((Unmethylated, Methylated))));
            assert!(!r.is_applicable(Hemimethylated, Some((Hemimethylated, Hemimethylated))));
        }
    }

    #[test]
    fn neighbour_reactions_need_neighbours() {
        let t = table();
        for index in 4..NUM_REACTIONS {
            assert!(!t.get(index).is_applicable(Hemimethylated, None));
        }
    }

    #[test]
    fn negative_or_nan_rates_are_rejected() {
        assert!(ReactionTable::new(RateConstants::new(-1.0, 0.5, 0.5)).is_err());
        assert!(ReactionTable::new(RateConstants::new(1.0, F::NAN, 0.5)).is_err());
        assert!(ReactionTable::new(RateConstants::new(1.0, 0.5, F::INFINITY)).is_err());
        assert!(ReactionTable::new(RateConstants::new(0.0, 0.0, 0.0)).is_ok());
    }

    #[test]
    fn overflowing_derived_rates_are_rejected() {
        // a·x·y overflows to inf
        let err = ReactionTable::new(RateConstants::new(1e200, 1e200, 0.5)).unwrap_err();
        assert!(matches!(err, SimError::Configuration(_)));
        // a·x overflows, then inf·0 is NaN
        let err = ReactionTable::new(RateConstants::new(1e200, 1e200, 0.0)).unwrap_err();
        assert!(matches!(err, SimError::Configuration(_)));
        // large but representable
        assert!(ReactionTable::new(RateConstants::new(1e100, 1e100, 0.5)).is_ok());
    }
}
