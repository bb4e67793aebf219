use nalgebra::{DMatrix, DVector};
use rayon::prelude::*;

use crate::reactions::{ReactionTable, NUM_REACTIONS};
use crate::{CpgStateMatrix, Methylation, Ring, F};

/// Applicability and rate of every (reaction, site, replicate) triple for one
/// snapshot of the state matrix, with per-site and per-replicate totals.
///
/// Entries are laid out replicate-major, then site, then reaction, so the
/// twelve rates of one site are a contiguous slice.
#[derive(Clone, Debug)]
pub struct PropensityTensor {
    num_sites: usize,
    num_replicates: usize,
    applicable: Vec<bool>,
    rates: Vec<F>,
    by_site: DMatrix<F>,
    by_replicate: DVector<F>,
}

impl PropensityTensor {
    pub fn build(table: &ReactionTable, ring: &Ring, states: &CpgStateMatrix) -> Self {
        let num_sites = states.num_sites();
        let num_replicates = states.num_replicates();
        let width = num_sites * NUM_REACTIONS;

        let mut applicable = vec![false; width * num_replicates];
        let mut rates = vec![0.0; width * num_replicates];
        let mut site_totals = vec![0.0; num_sites * num_replicates];

        applicable
            .par_chunks_mut(width)
            .zip(rates.par_chunks_mut(width))
            .zip(site_totals.par_chunks_mut(num_sites))
            .enumerate()
            .for_each(|(replicate, ((applicable, rates), totals))| {
                fill_replicate(table, ring, states.column(replicate), applicable, rates, totals);
            });

        let by_site = DMatrix::from_vec(num_sites, num_replicates, site_totals);
        let by_replicate = DVector::from_iterator(
            num_replicates,
            by_site.column_iter().map(|column| column.sum()),
        );

        Self {
            num_sites,
            num_replicates,
            applicable,
            rates,
            by_site,
            by_replicate,
        }
    }

    pub fn num_sites(&self) -> usize {
        self.num_sites
    }

    pub fn num_replicates(&self) -> usize {
        self.num_replicates
    }

    fn offset(&self, site: usize, replicate: usize) -> usize {
        (replicate * self.num_sites + site) * NUM_REACTIONS
    }

    pub fn is_applicable(&self, reaction: usize, site: usize, replicate: usize) -> bool {
        self.applicable[self.offset(site, replicate) + reaction]
    }

    pub fn rate(&self, reaction: usize, site: usize, replicate: usize) -> F {
        self.rates[self.offset(site, replicate) + reaction]
    }

    /// Rates of all reactions at one site, zero where inapplicable.
    pub fn site_rates(&self, site: usize, replicate: usize) -> &[F] {
        let start = self.offset(site, replicate);
        &self.rates[start..start + NUM_REACTIONS]
    }

    /// Total propensity of each site of one replicate, in site order.
    pub fn site_totals(&self, replicate: usize) -> &[F] {
        let n = self.num_sites;
        &self.by_site.as_slice()[replicate * n..(replicate + 1) * n]
    }

    /// Per-site totals, shaped `num_sites x num_replicates`.
    pub fn by_site(&self) -> &DMatrix<F> {
        &self.by_site
    }

    pub fn replicate_total(&self, replicate: usize) -> F {
        self.by_replicate[replicate]
    }

    pub fn by_replicate(&self) -> &DVector<F> {
        &self.by_replicate
    }
}

fn fill_replicate(
    table: &ReactionTable,
    ring: &Ring,
    chain: &[Methylation],
    applicable: &mut [bool],
    rates: &mut [F],
    totals: &mut [F],
) {
    for (site, &state) in chain.iter().enumerate() {
        let neighbors = ring.neighbors(site).map(|(l, r)| (chain[l], chain[r]));
        let offset = site * NUM_REACTIONS;
        let mut total = 0.0;
        for reaction in table.iter() {
            let fires = reaction.is_applicable(state, neighbors);
            let rate = if fires { reaction.rate } else { 0.0 };
            applicable[offset + reaction.index] = fires;
            rates[offset + reaction.index] = rate;
            total += rate;
        }
        totals[site] = total;
    }
}
