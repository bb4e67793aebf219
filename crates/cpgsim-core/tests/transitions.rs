use approx::assert_abs_diff_eq;
use cpgsim_core::{
    CpgStateMatrix, Methylation, ModelConfig, PropensityTensor, ReplicateStreams, RunSpec,
    Simulator, Trajectory, NUM_REACTIONS,
};

fn simulate(sites: usize, replicates: usize, seed: u64, t_end: f64) -> (Simulator, Trajectory) {
    let config = ModelConfig::new(sites, replicates, 1.0, 0.5, 0.5);
    let mut sim = Simulator::with_seed(config, seed).unwrap();
    let trajectory = sim.run(&RunSpec::new((0.0, t_end), 50)).unwrap();
    (sim, trajectory)
}

#[test]
fn sequences_are_aligned() {
    let (_, trajectory) = simulate(6, 3, 17, 4.0);
    assert_eq!(trajectory.states.len(), trajectory.times.len());
    assert_eq!(trajectory.len(), trajectory.steps() + 1);
    assert_eq!(trajectory.events.len(), trajectory.steps());
    assert!(trajectory.steps() > 0);
}

#[test]
fn time_never_decreases() {
    let (_, trajectory) = simulate(6, 5, 23, 4.0);
    for replicate in 0..5 {
        let times = trajectory.replicate_times(replicate);
        assert_eq!(times[0], 0.0);
        for pair in times.windows(2) {
            assert!(pair[1] >= pair[0], "time went backwards: {:?}", pair);
        }
    }
}

#[test]
fn every_change_is_an_applicable_reaction() {
    let (sim, trajectory) = simulate(7, 4, 31, 5.0);
    let table = sim.table();

    for (step, events) in trajectory.events.iter().enumerate() {
        let before = &trajectory.states[step];
        let after = &trajectory.states[step + 1];
        let tensor = PropensityTensor::build(table, sim.ring(), before);

        for (replicate, event) in events.iter().enumerate() {
            let event = event.expect("lockstep runs fire in every replicate");
            assert!(
                tensor.is_applicable(event.reaction, event.site, replicate),
                "step {step}: reaction {} not applicable at site {}",
                event.reaction,
                event.site
            );
            assert_eq!(after.get(event.site, replicate), table.get(event.reaction).product);

            for site in (0..before.num_sites()).filter(|&s| s != event.site) {
                assert_eq!(before.get(site, replicate), after.get(site, replicate));
            }
        }
    }
}

#[test]
fn observed_changes_match_some_product() {
    // Checked from the snapshots alone, without the event log.
    let (sim, trajectory) = simulate(5, 3, 37, 5.0);
    let table = sim.table();

    for pair in trajectory.states.windows(2) {
        let tensor = PropensityTensor::build(table, sim.ring(), &pair[0]);
        for replicate in 0..3 {
            for site in 0..5 {
                let old = pair[0].get(site, replicate);
                let new = pair[1].get(site, replicate);
                if old == new {
                    continue;
                }
                let explained = table
                    .iter()
                    .any(|r| r.product == new && tensor.is_applicable(r.index, site, replicate));
                assert!(explained, "{old:?} -> {new:?} at site {site} has no reaction");
            }
        }
    }
}

#[test]
fn states_stay_in_range() {
    let (_, trajectory) = simulate(4, 4, 41, 5.0);
    for states in &trajectory.states {
        assert!(states.levels().iter().all(|&level| level <= 2));
        assert_eq!(states.level_counts().iter().sum::<usize>(), 16);
    }
}

#[test]
fn first_events_follow_propensity_weights() {
    use Methylation::*;
    // M H M in every replicate: sites 0 and 2 carry 1.0 each, site 1 carries
    // 0.5 (reaction 1) + 1.0 (reaction 3) + 4 x 0.5 (reactions 8..12).
    let replicates = 20_000;
    let columns = vec![vec![Methylated, Hemimethylated, Methylated]; replicates];
    let states = CpgStateMatrix::from_columns(&columns).unwrap();
    let config = ModelConfig::new(3, replicates, 1.0, 0.5, 0.5);
    let streams = ReplicateStreams::new(4242, replicates);
    let mut sim = Simulator::with_initial_state(config, states, streams).unwrap();
    let trajectory = sim.run(&RunSpec::new((0.0, 1e-9), 1)).unwrap();

    let mut site_counts = [0usize; 3];
    let mut reaction_counts = [0usize; NUM_REACTIONS];
    for event in trajectory.events[0].iter().map(|e| e.unwrap()) {
        site_counts[event.site] += 1;
        if event.site == 1 {
            reaction_counts[event.reaction] += 1;
        }
    }

    let n = replicates as f64;
    assert_abs_diff_eq!(site_counts[0] as f64 / n, 1.0 / 5.5, epsilon = 0.015);
    assert_abs_diff_eq!(site_counts[1] as f64 / n, 3.5 / 5.5, epsilon = 0.015);
    assert_abs_diff_eq!(site_counts[2] as f64 / n, 1.0 / 5.5, epsilon = 0.015);

    let middle = site_counts[1] as f64;
    assert_abs_diff_eq!(reaction_counts[3] as f64 / middle, 1.0 / 3.5, epsilon = 0.02);
    for reaction in [1, 8, 9, 10, 11] {
        assert_abs_diff_eq!(reaction_counts[reaction] as f64 / middle, 0.5 / 3.5, epsilon = 0.02);
    }
    for reaction in [0, 2, 4, 5, 6, 7] {
        assert_eq!(reaction_counts[reaction], 0);
    }
}
