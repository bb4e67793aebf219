use nalgebra::{DMatrix, DVector};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::noise::ReplicateStreams;
use crate::{Result, SimError};

pub type Time = f64;

/// Methylation level of a single CpG site.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
#[repr(u8)]
pub enum Methylation {
    Unmethylated = 0,
    Hemimethylated = 1,
    Methylated = 2,
}

impl Methylation {
    pub const ALL: [Methylation; 3] = [
        Methylation::Unmethylated,
        Methylation::Hemimethylated,
        Methylation::Methylated,
    ];

    pub fn level(self) -> u8 {
        self as u8
    }

    pub fn from_level(level: u8) -> Option<Self> {
        match level {
            0 => Some(Methylation::Unmethylated),
            1 => Some(Methylation::Hemimethylated),
            2 => Some(Methylation::Methylated),
            _ => None,
        }
    }
}

impl From<Methylation> for u8 {
    fn from(m: Methylation) -> Self {
        m.level()
    }
}

impl TryFrom<u8> for Methylation {
    type Error = SimError;

    fn try_from(level: u8) -> Result<Self> {
        Methylation::from_level(level).ok_or_else(|| {
            SimError::Configuration(format!("methylation level {level} is not in 0..=2"))
        })
    }
}

/// Cyclic chain of sites. A chain of one site has no neighbours: the site is
/// never treated as adjacent to itself, although `(i ± 1) mod 1` would map it
/// back onto `i`. This is deliberate, not an off-by-one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ring {
    num_sites: usize,
}

impl Ring {
    pub fn new(num_sites: usize) -> Self {
        Self { num_sites }
    }

    pub fn len(&self) -> usize {
        self.num_sites
    }

    pub fn is_empty(&self) -> bool {
        self.num_sites == 0
    }

    pub fn left(&self, site: usize) -> Option<usize> {
        if self.num_sites < 2 {
            return None;
        }
        Some((site + self.num_sites - 1) % self.num_sites)
    }

    pub fn right(&self, site: usize) -> Option<usize> {
        if self.num_sites < 2 {
            return None;
        }
        Some((site + 1) % self.num_sites)
    }

    /// `(left, right)` neighbour indices of `site`.
    pub fn neighbors(&self, site: usize) -> Option<(usize, usize)> {
        Some((self.left(site)?, self.right(site)?))
    }
}

/// Methylation state of every site in every replicate, shaped
/// `num_sites x num_replicates`.
///
/// Storage is column-major, so each replicate's chain is one contiguous slice
/// of the arena.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CpgStateMatrix(pub DMatrix<Methylation>);

impl CpgStateMatrix {
    /// Draws every cell uniformly from the three methylation levels, each
    /// replicate from its own stream.
    pub fn uniform(num_sites: usize, streams: &mut ReplicateStreams) -> Self {
        let num_replicates = streams.len();
        let mut data = Vec::with_capacity(num_sites * num_replicates);
        for rng in streams.as_mut_slice() {
            data.extend((0..num_sites).map(|_| rng.methylation()));
        }
        CpgStateMatrix(DMatrix::from_vec(num_sites, num_replicates, data))
    }

    /// Builds a matrix from one chain per replicate. All chains must share a
    /// non-zero length.
    pub fn from_columns(columns: &[Vec<Methylation>]) -> Result<Self> {
        let num_sites = columns.first().map(Vec::len).unwrap_or(0);
        if num_sites == 0 {
            return Err(SimError::Configuration(
                "state matrix needs at least one site and one replicate".to_string(),
            ));
        }
        if let Some(bad) = columns.iter().position(|c| c.len() != num_sites) {
            return Err(SimError::Configuration(format!(
                "replicate {bad} has {} sites, expected {num_sites}",
                columns[bad].len()
            )));
        }
        let data: Vec<Methylation> = columns.iter().flatten().copied().collect();
        Ok(CpgStateMatrix(DMatrix::from_vec(num_sites, columns.len(), data)))
    }

    pub fn num_sites(&self) -> usize {
        self.0.nrows()
    }

    pub fn num_replicates(&self) -> usize {
        self.0.ncols()
    }

    pub fn get(&self, site: usize, replicate: usize) -> Methylation {
        self.0[(site, replicate)]
    }

    /// The chain of one replicate, in site order.
    pub fn column(&self, replicate: usize) -> &[Methylation] {
        let n = self.num_sites();
        &self.0.as_slice()[replicate * n..(replicate + 1) * n]
    }

    pub(crate) fn par_columns_mut(&mut self) -> rayon::slice::ChunksMut<'_, Methylation> {
        let n = self.num_sites();
        self.0.as_mut_slice().par_chunks_mut(n)
    }

    /// Number of sites at each level across all replicates, indexed by level.
    pub fn level_counts(&self) -> [usize; 3] {
        let mut counts = [0usize; 3];
        for m in self.0.iter() {
            counts[m.level() as usize] += 1;
        }
        counts
    }

    /// Raw levels in column-major order.
    pub fn levels(&self) -> Vec<u8> {
        self.0.iter().map(|m| m.level()).collect()
    }
}

impl std::ops::Deref for CpgStateMatrix {
    type Target = DMatrix<Methylation>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Elapsed simulation time of each replicate.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimeVector(pub DVector<Time>);

impl TimeVector {
    pub fn zeros(num_replicates: usize) -> Self {
        TimeVector(DVector::zeros(num_replicates))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, replicate: usize) -> Time {
        self.0[replicate]
    }

    /// Earliest elapsed time across replicates.
    pub fn min(&self) -> Time {
        self.0.iter().copied().fold(Time::INFINITY, Time::min)
    }

    pub fn all_reached(&self, horizon: Time) -> bool {
        self.0.iter().all(|&t| t >= horizon)
    }

    pub fn as_slice(&self) -> &[Time] {
        self.0.as_slice()
    }

    pub(crate) fn as_mut_slice(&mut self) -> &mut [Time] {
        self.0.as_mut_slice()
    }

    pub(crate) fn reset(&mut self) {
        self.0.fill(0.0);
    }
}

impl std::ops::Deref for TimeVector {
    type Target = DVector<Time>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<Vec<Time>> for TimeVector {
    fn from(v: Vec<Time>) -> Self {
        TimeVector(DVector::from_vec(v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use Methylation::*;

    #[test]
    fn ring_wraps_both_ends() {
        let ring = Ring::new(4);
        assert_eq!(ring.neighbors(0), Some((3, 1)));
        assert_eq!(ring.neighbors(3), Some((2, 0)));
        assert_eq!(ring.neighbors(1), Some((0, 2)));
    }

    #[test]
    fn two_site_ring_sees_the_other_site_twice() {
        let ring = Ring::new(2);
        assert_eq!(ring.neighbors(0), Some((1, 1)));
        assert_eq!(ring.neighbors(1), Some((0, 0)));
    }

    #[test]
    fn single_site_has_no_neighbours() {
        let ring = Ring::new(1);
        assert_eq!(ring.left(0), None);
        assert_eq!(ring.right(0), None);
        assert_eq!(ring.neighbors(0), None);
    }

    #[test]
    fn levels_convert_both_ways() {
        for m in Methylation::ALL {
            assert_eq!(Methylation::try_from(m.level()).unwrap(), m);
        }
        assert!(Methylation::try_from(3).is_err());
    }

    #[test]
    fn columns_are_contiguous_per_replicate() {
        let states = CpgStateMatrix::from_columns(&[
            vec![Unmethylated, Hemimethylated, Methylated],
            vec![Methylated, Methylated, Unmethylated],
        ])
        .unwrap();

        assert_eq!(states.num_sites(), 3);
        assert_eq!(states.num_replicates(), 2);
        assert_eq!(states.column(1), &[Methylated, Methylated, Unmethylated]);
        assert_eq!(states.get(1, 0), Hemimethylated);
        assert_eq!(states.level_counts(), [2, 1, 3]);
    }

    #[test]
    fn ragged_columns_are_rejected() {
        let err = CpgStateMatrix::from_columns(&[vec![Unmethylated], vec![]]).unwrap_err();
        assert!(matches!(err, SimError::Configuration(_)));
        assert!(CpgStateMatrix::from_columns(&[]).is_err());
    }

    #[test]
    fn matrix_serializes_as_levels() {
        let states = CpgStateMatrix::from_columns(&[vec![Methylated, Unmethylated]]).unwrap();
        let json = serde_json::to_string(&states).unwrap();
        let back: CpgStateMatrix = serde_json::from_str(&json).unwrap();
        assert_eq!(back, states);
        assert!(json.contains('2'));
    }

    #[test]
    fn time_vector_min_and_horizon() {
        let times = TimeVector::from(vec![5.5, 4.0, 7.25]);
        assert_eq!(times.min(), 4.0);
        assert!(times.all_reached(4.0));
        assert!(!times.all_reached(5.0));
    }
}
