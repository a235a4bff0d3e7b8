use anyhow::{anyhow, Result};
use serde_json::{json, Value};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use abxbench::ab::{AbPhase, AbTestParams};
use abxbench::abx::{AbxChoice, AbxTestParams, Guess, GuessOutcome};
use abxbench::channel::ConnectionState;
use abxbench::clock::ManualClock;
use abxbench::config::SystemConfig;
use abxbench::controller::{Bench, BenchEvent};
use abxbench::error::BenchError;
use abxbench::protocol::Action;
use abxbench::random::RngSource;
use abxbench::simulation::SimulatedAmp;
use abxbench::stats::Verdict;
use abxbench::traits::{RandomSource, Transport};
use abxbench::view::View;

// --- Simulated amplifier with a side door ---

/// The simulated amplifier, plus a way for the test to push unsolicited
/// snapshots and to cut the link.
#[derive(Default)]
struct AmpRig {
    amp: SimulatedAmp,
    injected: VecDeque<Value>,
    cut: bool,
    refuse_open: bool,
}

#[derive(Clone, Default)]
struct RigRef(Rc<RefCell<AmpRig>>);

impl RigRef {
    fn push(&self, v: Value) {
        self.0.borrow_mut().injected.push_back(v);
    }

    fn cut(&self) {
        self.0.borrow_mut().cut = true;
    }

    fn actions(&self) -> Vec<Action> {
        self.0.borrow().amp.requests().iter().map(|r| r.action).collect()
    }

    fn values(&self, action: Action) -> Vec<Value> {
        self.0
            .borrow()
            .amp
            .requests()
            .iter()
            .filter(|r| r.action == action)
            .map(|r| r.value.clone())
            .collect()
    }
}

impl Transport for RigRef {
    fn open(&mut self) -> Result<()> {
        let mut rig = self.0.borrow_mut();
        if rig.refuse_open {
            return Err(anyhow!("connection refused"));
        }
        rig.cut = false;
        rig.amp.open()
    }

    fn send_text(&mut self, text: &str) -> Result<()> {
        self.0.borrow_mut().amp.send_text(text)
    }

    fn recv_text(&mut self) -> Result<Option<String>> {
        let mut rig = self.0.borrow_mut();
        if rig.cut {
            return Err(anyhow!("connection reset"));
        }
        if let Some(v) = rig.injected.pop_front() {
            return Ok(Some(v.to_string()));
        }
        rig.amp.recv_text()
    }
}

/// Coin that replays a script, then keeps landing heads.
struct ScriptedCoin(VecDeque<bool>);

impl ScriptedCoin {
    fn new(flips: &[bool]) -> Self {
        ScriptedCoin(flips.iter().copied().collect())
    }
}

impl RandomSource for ScriptedCoin {
    fn coin_flip(&mut self) -> bool {
        self.0.pop_front().unwrap_or(true)
    }
}

type TestBench = Bench<RigRef, ManualClock, ScriptedCoin>;

fn rig_bench(flips: &[bool]) -> (TestBench, RigRef, ManualClock) {
    let _ = env_logger::builder().is_test(true).try_init();
    let rig = RigRef::default();
    let clock = ManualClock::new();
    let mut bench = Bench::new(rig.clone(), clock.clone(), ScriptedCoin::new(flips), SystemConfig::default());
    bench.connect();
    (bench, rig, clock)
}

fn abx_params(trials: u32, muted: bool) -> AbxTestParams {
    AbxTestParams {
        preset_a: 1,
        preset_b: 2,
        total_trials: trials,
        muted_during_switch: muted,
    }
}

fn ab_params(min: u32, max: u32) -> AbTestParams {
    AbTestParams {
        preset_a: 1,
        preset_b: 2,
        muted_during_switch: false,
        min_duration_secs: min,
        max_duration_secs: max,
    }
}

fn answer(x_is_a: bool, correct: bool) -> Guess {
    match (x_is_a, correct) {
        (true, true) | (false, false) => Guess::A,
        _ => Guess::B,
    }
}

fn run_abx(bench: &mut TestBench, flips: &[bool], hits: &[bool]) -> GuessOutcome {
    bench.start_abx(abx_params(hits.len() as u32, false)).unwrap();
    let mut last = None;
    for (x_is_a, correct) in flips.iter().zip(hits) {
        bench.present_abx(AbxChoice::X).unwrap();
        last = Some(bench.submit_guess(answer(*x_is_a, *correct)).unwrap());
    }
    last.unwrap()
}

// --- Scenarios ---

#[test]
fn test_abx_five_of_five_rejects_null() {
    let flips = [true, false, false, true, false];
    let (mut bench, _rig, _clock) = rig_bench(&flips);

    let outcome = run_abx(&mut bench, &flips, &[true; 5]);
    let GuessOutcome::Finished(result) = outcome else {
        panic!("session should be over, got {:?}", outcome);
    };
    assert_eq!((result.correct, result.trials), (5, 5));
    assert!((result.p_value - 0.03125).abs() < 1e-12);
    assert_eq!(result.verdict, Verdict::RejectNull);
    assert!(result.interpretation().contains("reject the null hypothesis"));
    assert_eq!(bench.view(), View::AbxResults);
}

#[test]
fn test_abx_three_of_five_fails_to_reject() {
    let flips = [false, true, true, false, true];
    let (mut bench, _rig, _clock) = rig_bench(&flips);

    let outcome = run_abx(&mut bench, &flips, &[true, false, true, false, true]);
    let GuessOutcome::Finished(result) = outcome else {
        panic!("session should be over, got {:?}", outcome);
    };
    assert_eq!(result.correct, 3);
    assert!((result.p_value - 0.5).abs() < 1e-12);
    assert_eq!(result.verdict, Verdict::FailToReject);
    assert!(result.interpretation().contains("fail to reject"));
}

#[test]
fn test_abx_presents_hidden_preset() {
    // X drawn as B for the first trial
    let (mut bench, rig, _clock) = rig_bench(&[false]);
    bench.start_abx(abx_params(3, false)).unwrap();

    assert_eq!(bench.present_abx(AbxChoice::X), Ok(2));
    assert_eq!(bench.present_abx(AbxChoice::A), Ok(1));
    assert_eq!(rig.values(Action::SetPreset), vec![json!(1), json!(2), json!(1)]);
    assert_eq!(bench.submit_guess(Guess::B), Ok(GuessOutcome::NextTrial { trial: 2 }));
}

#[test]
fn test_abx_hidden_preset_stays_in_pair_over_long_session() {
    let _ = env_logger::builder().is_test(true).try_init();
    let rig = RigRef::default();
    let mut bench = Bench::new(rig, ManualClock::new(), RngSource::seeded(7), SystemConfig::default());
    bench.connect();

    let trials = 200;
    bench.start_abx(abx_params(trials, false)).unwrap();
    let mut seen_a = 0;
    for trial in 1..=trials {
        let x = bench.present_abx(AbxChoice::X).unwrap();
        assert!(x == 1 || x == 2, "trial {} presented preset {}", trial, x);
        if x == 1 {
            seen_a += 1;
        }
        let outcome = bench.submit_guess(Guess::A).unwrap();
        if trial < trials {
            assert_eq!(outcome, GuessOutcome::NextTrial { trial: trial + 1 });
        } else {
            let GuessOutcome::Finished(result) = outcome else {
                panic!("session should be over, got {:?}", outcome);
            };
            assert_eq!(result.correct, seen_a);
        }
    }
    // both presets get hidden behind X
    assert!(seen_a > 0 && seen_a < trials);
}

#[test]
fn test_abx_early_stop_scores_completed_trials() {
    let (mut bench, _rig, _clock) = rig_bench(&[]);
    bench.start_abx(abx_params(10, false)).unwrap();
    bench.submit_guess(Guess::A).unwrap();
    bench.submit_guess(Guess::A).unwrap();

    let result = bench.stop_abx().unwrap();
    assert_eq!((result.correct, result.trials), (2, 2));
    assert!((result.p_value - 0.25).abs() < 1e-12);
    assert_eq!(bench.view(), View::AbxResults);
    assert_eq!(bench.submit_guess(Guess::A), Err(BenchError::NotRunning("ABX")));
}

#[test]
fn test_muted_switch_unmutes_after_delay() {
    let (mut bench, rig, clock) = rig_bench(&[]);
    bench.start_abx(abx_params(2, true)).unwrap();
    assert_eq!(
        rig.actions(),
        vec![Action::GetState, Action::SetMute, Action::SetPreset]
    );

    clock.advance(500);
    bench.process_loop_iteration();
    bench.present_abx(AbxChoice::B).unwrap();

    // first unmute at 1000, second at 1500
    clock.advance(500);
    bench.process_loop_iteration();
    assert_eq!(rig.values(Action::SetMute), vec![json!(true), json!(true), json!(false)]);

    clock.advance(500);
    bench.process_loop_iteration();
    assert_eq!(
        rig.values(Action::SetMute),
        vec![json!(true), json!(true), json!(false), json!(false)]
    );
}

#[test]
fn test_disconnected_snapshot_overrides_session() {
    let (mut bench, rig, _clock) = rig_bench(&[]);
    bench.start_ab(ab_params(5, 10)).unwrap();
    assert_eq!(bench.view(), View::AbActive);
    assert!(bench.ui_enabled());

    rig.push(json!({
        "amp_state": { "preset": 0 },
        "ab_test": { "preset_a": 1, "preset_b": 2, "is_running": true, "is_finished": false }
    }));
    bench.process_loop_iteration();

    assert_eq!(bench.view(), View::MainControl);
    assert!(!bench.ui_enabled());
    assert_eq!(bench.device().display_name(), "NOT CONNECTED");
}

#[test]
fn test_disconnected_snapshot_leaves_abx() {
    let (mut bench, rig, _clock) = rig_bench(&[]);
    bench.start_abx(abx_params(4, false)).unwrap();

    rig.push(json!({ "amp_state": { "preset": 2, "filter_name": "x" } }));
    bench.process_loop_iteration();
    assert_eq!(bench.view(), View::AbxActive);

    rig.push(json!({ "amp_state": { "preset": 0 } }));
    bench.process_loop_iteration();
    assert_eq!(bench.view(), View::MainControl);
}

#[test]
fn test_simulated_get_state_is_synchronous() {
    let (mut bench, _rig, _clock) = rig_bench(&[]);

    // No loop iteration: the answer arrives inside the action.
    bench.refresh();
    let dev = bench.device();
    assert_eq!(dev.active_preset, 1);
    assert!((dev.volume_db - -42.0).abs() < f64::EPSILON);
    assert_eq!(dev.filter_name, "test mode");
    assert_eq!(bench.view(), View::MainControl);
}

#[test]
fn test_inverted_durations_send_nothing() {
    let (mut bench, rig, _clock) = rig_bench(&[]);
    let err = bench.start_ab(ab_params(10, 5)).unwrap_err();

    assert_eq!(err, BenchError::InvalidDurations { min_secs: 10, max_secs: 5 });
    assert_eq!(rig.actions(), vec![Action::GetState]);
    assert_eq!(bench.ab().phase(), AbPhase::Idle);
}

#[test]
fn test_like_round_trip() {
    let (mut bench, rig, clock) = rig_bench(&[]);
    bench.start_ab(ab_params(5, 10)).unwrap();
    assert_eq!(
        rig.values(Action::StartTest),
        vec![json!({ "preset_a": 1, "preset_b": 2, "min_time": 5, "max_time": 10 })]
    );

    // device on preset 1
    assert_eq!(bench.log_like(), Ok(1));

    // device switches to preset 2 on its own schedule
    clock.advance(7_000);
    rig.push(json!({
        "amp_state": { "preset": 2, "filter_name": "test mode" },
        "ab_test": { "preset_a": 1, "preset_b": 2, "is_running": true, "is_finished": false }
    }));
    bench.process_loop_iteration();
    assert_eq!(bench.log_like(), Ok(2));
    assert_eq!(bench.log_like(), Ok(2));

    clock.advance(3_000);
    bench.process_loop_iteration();
    let results = bench.stop_ab().unwrap();
    assert_eq!((results.likes_a, results.likes_b), (1, 2));
    assert_eq!(results.elapsed_secs, 10);
    assert_eq!(bench.view(), View::AbResults);
}

#[test]
fn test_device_ends_ab_test() {
    let (mut bench, rig, clock) = rig_bench(&[]);
    bench.start_ab(ab_params(5, 10)).unwrap();
    bench.take_events();

    clock.advance(4_000);
    rig.push(json!({
        "amp_state": { "preset": 1 },
        "ab_test": { "preset_a": 1, "preset_b": 2, "is_running": false, "is_finished": true }
    }));
    bench.process_loop_iteration();

    assert_eq!(bench.view(), View::AbResults);
    assert_eq!(bench.ab().phase(), AbPhase::Finished);
    let events = bench.take_events();
    assert!(events.iter().any(|e| matches!(e, BenchEvent::AbFinished(r) if r.elapsed_secs == 4)));
}

#[test]
fn test_stopwatch_not_restarted_by_snapshots() {
    let (mut bench, rig, clock) = rig_bench(&[]);
    bench.start_ab(ab_params(5, 10)).unwrap();

    for _ in 0..5 {
        clock.advance(1_000);
        rig.push(json!({
            "amp_state": { "preset": 2 },
            "ab_test": { "is_running": true }
        }));
        bench.process_loop_iteration();
    }
    assert_eq!(bench.ab().stopwatch().elapsed_secs(), 5);
}

#[test]
fn test_link_flap_during_ab_keeps_stopwatch() {
    let (mut bench, rig, clock) = rig_bench(&[]);
    bench.start_ab(ab_params(5, 10)).unwrap();

    for _ in 0..3 {
        clock.advance(1_000);
        rig.push(json!({ "amp_state": { "preset": 0 }, "ab_test": { "is_running": true } }));
        bench.process_loop_iteration();
        assert_eq!(bench.view(), View::MainControl);
        rig.push(json!({ "amp_state": { "preset": 1 }, "ab_test": { "is_running": true } }));
        bench.process_loop_iteration();
        assert_eq!(bench.view(), View::AbActive);
    }
    bench.take_events();

    clock.advance(4_000);
    for _ in 0..4 {
        bench.process_loop_iteration();
    }
    let elapsed: Vec<_> = bench
        .take_events()
        .into_iter()
        .filter(|e| matches!(e, BenchEvent::Elapsed(_)))
        .collect();
    // one overdue tick, one chain
    assert_eq!(elapsed, vec![BenchEvent::Elapsed("00:07".into())]);
    assert_eq!(bench.ab().stopwatch().elapsed_secs(), 7);
}

#[test]
fn test_link_loss_reconnects_with_fresh_state() {
    let (mut bench, rig, clock) = rig_bench(&[]);
    rig.cut();
    bench.process_loop_iteration();
    assert_eq!(bench.connection_state(), ConnectionState::Disconnected);

    // sends while down are dropped
    bench.set_preset(3);
    assert!(rig.values(Action::SetPreset).is_empty());

    clock.advance(2_000);
    bench.process_loop_iteration();
    assert_eq!(bench.connection_state(), ConnectionState::Open);
    assert_eq!(rig.actions(), vec![Action::GetState, Action::GetState]);
    assert_eq!(bench.device().active_preset, 1);
    assert_eq!(bench.synchronizer().channel().reconnect_count(), 1);
}

#[test]
fn test_refused_open_keeps_retrying() {
    let _ = env_logger::builder().is_test(true).try_init();
    let rig = RigRef::default();
    rig.0.borrow_mut().refuse_open = true;
    let clock = ManualClock::new();
    let mut bench = Bench::new(rig.clone(), clock.clone(), ScriptedCoin::new(&[]), SystemConfig::default());
    bench.connect();

    for _ in 0..3 {
        clock.advance(2_000);
        bench.process_loop_iteration();
    }
    assert_eq!(bench.synchronizer().channel().reconnect_count(), 4);
    assert!(rig.actions().is_empty());

    rig.0.borrow_mut().refuse_open = false;
    clock.advance(2_000);
    bench.process_loop_iteration();
    assert_eq!(bench.connection_state(), ConnectionState::Open);
    assert!(bench.ui_enabled());
}
