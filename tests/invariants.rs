// tests/invariants.rs

mod common;
use crate::common::{issue, root, utc, ConfigFileBuilder, DATA_ROOT, STATE_FILE};

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::TimeDelta;
use proptest::prelude::*;

use forcewatch::dispatch::FailureHandling;
use forcewatch::engine::{CoreCommand, CoreRuntime, CoreSettings};
use forcewatch::exec::ActionOutcome;
use forcewatch::fs::mock::MockFileSystem;
use forcewatch::probe::{newest_across, FsProbe};
use forcewatch::state::{decode, encode, PersistedState};
use forcewatch::tracker::{ForcingPolicy, StepKey, Timing};
use forcewatch::types::ActionKind;
use forcewatch_test_utils::fixtures::put_forcing;

/// Step 0 inputs of cycle `2024010100` (input, issue dir).
const INPUTS: [(&str, &str); 5] = [
    ("hrrr0", "2024010100"),
    ("hrrr3", "2023123121"),
    ("rap0", "2024010100"),
    ("rap3", "2023123121"),
    ("mrms", "2024010100"),
];

const PASSES: usize = 8;

fn availability(state: &PersistedState) -> BTreeMap<(StepKey, String), bool> {
    let mut out = BTreeMap::new();
    for cycle in state.cycles.iter() {
        for step in cycle.steps.iter() {
            for (input, flag) in step.available.iter() {
                out.insert((cycle.key(step), input.clone()), *flag);
            }
        }
    }
    out
}

#[derive(Debug, Default)]
struct Simulation {
    dispatches: BTreeMap<StepKey, Vec<ActionKind>>,
    lost_flags: Vec<(StepKey, String)>,
    /// Step was open when its last input arrived but did not get `Full`.
    not_full: Vec<StepKey>,
    /// Every input present, yet the step is still open after the pass.
    left_open: Vec<StepKey>,
}

fn step_dispatched(state: &PersistedState, key: StepKey) -> Option<bool> {
    state
        .cycle(key.issue)
        .and_then(|c| c.step(key.offset))
        .map(|s| s.dispatched)
}

/// Drive `PASSES` passes through the core, dropping each input on the pass
/// named in `arrivals` (or never, for indices past the end), and persisting
/// through the codec between passes.
fn simulate(arrivals: &[usize], gaps: &[i64]) -> Simulation {
    let cfg = ConfigFileBuilder::analysis(DATA_ROOT, STATE_FILE).build();
    let policy = ForcingPolicy::from_config(&cfg);
    let settings = CoreSettings {
        timing: Timing::from_config(&cfg.config),
        failure: FailureHandling::from_config(&cfg.config),
    };
    let fs = MockFileSystem::new();
    let probe = FsProbe::new(Arc::new(fs.clone()));

    let mut sim = Simulation::default();
    let mut state = PersistedState::empty();
    let mut now = utc("2024010100");

    for pass in 0..PASSES {
        for ((input, issue_dir), arrives) in INPUTS.iter().zip(arrivals) {
            if *arrives == pass {
                put_forcing(&fs, &root(input), issue_dir, "202401010000");
            }
        }
        now += TimeDelta::minutes(gaps[pass]);

        let before = availability(&state);
        let mut core = CoreRuntime::new(state, policy.clone(), settings);
        let (newest, _) = newest_across(&probe, policy.input_roots());
        core.observe(newest, now);
        core.refresh(&probe, now);

        let key = StepKey {
            issue: issue("2024010100"),
            offset: 0,
        };
        let all_present = arrivals.iter().all(|a| *a <= pass);
        let open_before = step_dispatched(core.state(), key) == Some(false);

        let step = core.plan(now);
        let mut this_pass = Vec::new();
        for command in step.commands {
            if let CoreCommand::Layer { plan, .. } = command {
                sim.dispatches.entry(plan.key).or_default().push(plan.kind);
                if plan.key == key {
                    this_pass.push(plan.kind);
                }
                core.settle(&plan, &ActionOutcome::Succeeded);
            }
        }

        if all_present {
            if open_before && this_pass != vec![ActionKind::Full] {
                sim.not_full.push(key);
            }
            if step_dispatched(core.state(), key) != Some(true) {
                sim.left_open.push(key);
            }
        }

        let text = encode(core.state()).expect("encode");
        state = decode(&text).expect("decode");

        let after = availability(&state);
        for (k, was) in before {
            if was && !after.get(&k).copied().unwrap_or(false) {
                sim.lost_flags.push(k);
            }
        }
    }
    sim
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_each_step_dispatched_at_most_once(
        arrivals in prop::collection::vec(0usize..PASSES + 2, INPUTS.len()),
        gaps in prop::collection::vec(0i64..15, PASSES),
    ) {
        let sim = simulate(&arrivals, &gaps);
        for (key, kinds) in sim.dispatches.iter() {
            prop_assert!(kinds.len() <= 1, "{key} dispatched {kinds:?}");
        }
    }

    #[test]
    fn prop_availability_never_regresses(
        arrivals in prop::collection::vec(0usize..PASSES + 2, INPUTS.len()),
        gaps in prop::collection::vec(0i64..15, PASSES),
    ) {
        let sim = simulate(&arrivals, &gaps);
        prop_assert!(sim.lost_flags.is_empty(), "flags went false: {:?}", sim.lost_flags);
    }

    #[test]
    fn prop_complete_inputs_always_dispatch(
        arrivals in prop::collection::vec(0usize..PASSES, INPUTS.len()),
        gaps in prop::collection::vec(0i64..15, PASSES),
    ) {
        let sim = simulate(&arrivals, &gaps);
        prop_assert!(sim.left_open.is_empty(), "still open: {:?}", sim.left_open);
        prop_assert!(sim.not_full.is_empty(), "degraded despite full set: {:?}", sim.not_full);
    }
}

#[test]
fn test_simultaneous_arrival_dispatches_full() {
    let sim = simulate(&[0, 0, 0, 0, 0], &[1; PASSES]);
    let key = StepKey {
        issue: issue("2024010100"),
        offset: 0,
    };
    assert_eq!(sim.dispatches.get(&key), Some(&vec![ActionKind::Full]));
}
