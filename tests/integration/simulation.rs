//! End-to-end runs of the macro engine against scripted chat screens.
//!
//! Every test runs on tokio's paused clock, so turn delays and backoff
//! cost no wall time and timings can be asserted exactly.

use std::fs;
use std::path::Path;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tempfile::tempdir;
use tokio::time::Instant;

use sword_macro::config::MacroConfig;
use sword_macro::control::ControlSignal;
use sword_macro::engine::{MacroEngine, RunOutcome, RunPlan};
use sword_macro::journal::{Journal, JournalPaths};
use sword_macro::platform::Point;
use sword_macro::types::StopReason;

use crate::mock_platform::Mocks;

const ANCHOR: Point = Point { x: 500, y: 900 };

fn engine(cfg: &MacroConfig, dir: &Path) -> (MacroEngine, Mocks, ControlSignal) {
    engine_with(cfg, dir, |_| {})
}

fn engine_with(
    cfg: &MacroConfig,
    dir: &Path,
    tweak: impl FnOnce(&mut Mocks),
) -> (MacroEngine, Mocks, ControlSignal) {
    let control = ControlSignal::new();
    let mut mocks = Mocks::new(&control);
    tweak(&mut mocks);
    let journal = Journal::new(JournalPaths::all_in(dir));
    let engine = MacroEngine::new(cfg.clone(), mocks.collaborators(), journal, control.clone());
    (engine, mocks, control)
}

fn csv_rows(dir: &Path) -> Vec<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(dir.join("sword_data.csv"))
        .unwrap();
    reader
        .records()
        .map(|r| r.unwrap().iter().map(str::to_string).collect())
        .collect()
}

fn decision_log(dir: &Path) -> String {
    fs::read_to_string(dir.join("sword_macro.log")).unwrap()
}

fn enhanced(level: u32) -> String {
    format!("[+{level}] 강화 성공")
}

// ---------------------------------------------------------------------------
// Full cycles
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn test_mine_gold_cycle_end_to_end() {
    let dir = tempdir().unwrap();
    let mut cfg = MacroConfig::default();
    cfg.min_gold = 100;
    let (mut engine, mocks, _control) = engine(&cfg, dir.path());

    let mut screens = vec![
        String::new(),
        "새로운 검 획득: 불꽃의 검\n남은 골드: 1,000G".to_string(),
    ];
    screens.extend((1..10).map(enhanced));
    screens.push("[+10] 강화 성공\n남은 골드: 1,500G".into());
    screens.push("판매 완료\n남은 골드: 50G".into());
    mocks.ocr.push(screens);

    let report = engine.run(&RunPlan::mine_gold(&cfg, ANCHOR)).await;

    assert_eq!(report.outcome, RunOutcome::Stopped(StopReason::GoldFloor));
    assert_eq!(report.summary.cycles, 1);
    assert_eq!(report.summary.hidden, 1);
    assert_eq!(report.summary.enhance_ok, 10);
    assert_eq!(report.summary.destroyed, 0);
    assert_eq!(report.summary.gold_first, 1_000);
    assert_eq!(report.summary.gold_last, 50);
    assert_eq!(report.summary.gold_peak, 1_500);
    assert_eq!(report.summary.gold_low, 50);
    // 1,500 → 50 after the sale
    assert!((report.summary.max_drawdown - 1_450.0 / 15.0).abs() < 1e-9);
    assert!((report.summary.roi + 95.0).abs() < 1e-9);
    assert_eq!(mocks.ocr.remaining(), 0);

    let mut expected = vec!["/판매", "/강화", "/판매"];
    expected.extend(["/강화"; 10]);
    expected.extend(["/판매", "/판매"]);
    assert_eq!(mocks.input.commands(), expected);

    assert_eq!(mocks.overlay.shown.load(Ordering::SeqCst), 1);
    assert_eq!(mocks.overlay.hidden.load(Ordering::SeqCst), 1);
    assert_eq!(mocks.ocr.inits.load(Ordering::SeqCst), 1);

    let rows = csv_rows(dir.path());
    let events: Vec<&str> = rows.iter().map(|r| r[1].as_str()).collect();
    assert_eq!(events.len(), 14);
    assert_eq!(events[0], "farm");
    assert_eq!(&events[11..], ["goal", "cycle_end", "sell"]);

    let farm = &rows[0];
    assert_eq!(farm[3], "hidden");
    assert_eq!(farm[4], "1000");
    assert_eq!(farm[6], "money");
    // the drop is logged before its cycle opens
    assert_eq!(farm[7], "");

    let cycle_end = &rows[12];
    assert_eq!(cycle_end[4], "1500");
    assert_eq!(cycle_end[7], "1");
    assert_eq!(cycle_end[9], "500");

    let log = decision_log(dir.path());
    assert!(log.contains("cycle #1 done"));
    assert!(log.contains("stopped: gold floor reached"));
    assert!(log.contains("Session stats"));
    assert!(log.contains("max drawdown 96.7%"));
}

#[tokio::test(start_paused = true)]
async fn test_hunt_hidden_destroy_returns_to_farming() {
    let dir = tempdir().unwrap();
    let cfg = MacroConfig::default();
    let (mut engine, mocks, _control) = engine(&cfg, dir.path());

    mocks.ocr.push([
        "새로운 검 획득: 낡은 검",
        "새로운 검 획득: 용의 검\n남은 골드: 2,000G",
        "[+1] 강화 성공",
        "강화 파괴\n남은 골드: 1,800G",
        "새로운 검 획득: 용의 검",
        "[+8] 강화 성공",
    ]);

    let report = engine
        .run(&RunPlan::hunt_hidden(8, false, ANCHOR))
        .await;

    assert_eq!(report.outcome, RunOutcome::Stopped(StopReason::GoalReached));
    assert_eq!(report.summary.trash, 1);
    assert_eq!(report.summary.hidden, 2);
    assert_eq!(report.summary.destroyed, 1);
    assert_eq!(report.summary.cycles, 1);
    assert_eq!(
        mocks.input.commands(),
        ["/판매", "/강화", "/판매", "/강화", "/강화", "/판매", "/강화"]
    );

    let rows = csv_rows(dir.path());
    let destroy = rows.iter().find(|r| r[3] == "destroy").unwrap();
    assert_eq!(destroy[2], "0");
    let cycle_end = rows.iter().find(|r| r[1] == "cycle_end").unwrap();
    assert_eq!(cycle_end[9], "-200");
    assert_eq!(rows.iter().filter(|r| r[1] == "sell").count(), 0);
}

// ---------------------------------------------------------------------------
// Stops
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn test_reach_level_stops_at_goal_with_policy_delays() {
    let dir = tempdir().unwrap();
    let cfg = MacroConfig::default();
    let (mut engine, mocks, _control) = engine(&cfg, dir.path());

    mocks.ocr.push(["[+3] 강화 성공", "[+4] 강화 유지", "[+5] 강화 성공"]);

    let started = Instant::now();
    let report = engine.run(&RunPlan::reach_level(5, ANCHOR)).await;

    assert_eq!(report.outcome, RunOutcome::Stopped(StopReason::GoalReached));
    assert_eq!(report.summary.enhance_ok, 2);
    assert_eq!(report.summary.enhance_hold, 1);
    assert_eq!(report.summary.cycles, 0);
    assert_eq!(mocks.input.commands(), ["/강화", "/강화", "/강화"]);

    // fast first, then the low-level boost delay twice
    let sent = mocks.input.sent.lock().unwrap().clone();
    let at: Vec<Duration> = sent.iter().map(|(_, _, t)| *t - started).collect();
    assert_eq!(at[0], Duration::ZERO);
    assert_eq!(at[1], Duration::from_millis(2_500));
    assert_eq!(at[2], Duration::from_millis(4_000));
    assert_eq!(sent[0].1, ANCHOR);
}

#[tokio::test(start_paused = true)]
async fn test_insufficient_funds_stops() {
    let dir = tempdir().unwrap();
    let cfg = MacroConfig::default();
    let (mut engine, mocks, _control) = engine(&cfg, dir.path());

    mocks.ocr.push(["[+2] 강화 성공", "[+2] 강화 성공\n골드가 부족해"]);

    let report = engine.run(&RunPlan::reach_level(10, ANCHOR)).await;
    assert_eq!(report.outcome, RunOutcome::Stopped(StopReason::InsufficientFunds));
    assert_eq!(report.summary.enhance_ok, 1);
}

#[tokio::test(start_paused = true)]
async fn test_time_limit_stops_blind_run() {
    let dir = tempdir().unwrap();
    let mut cfg = MacroConfig::default();
    cfg.max_run_minutes = Some(1);
    let (mut engine, mocks, _control) =
        engine_with(&cfg, dir.path(), |m| m.capture.unavailable = true);

    let started = Instant::now();
    let report = engine.run(&RunPlan::reach_level(10, ANCHOR)).await;

    assert_eq!(report.outcome, RunOutcome::Stopped(StopReason::TimeLimit));
    assert!(started.elapsed() >= Duration::from_secs(60));
    assert_eq!(mocks.ocr.reads.load(Ordering::SeqCst), 0);
    assert!(!mocks.capture.regions.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_script_interrupts_with_summary() {
    let dir = tempdir().unwrap();
    let cfg = MacroConfig::default();
    let (mut engine, mocks, _control) = engine(&cfg, dir.path());

    mocks.ocr.push([enhanced(1)]);

    let report = engine.run(&RunPlan::reach_level(10, ANCHOR)).await;
    assert_eq!(report.outcome, RunOutcome::Interrupted);
    assert_eq!(report.summary.enhance_ok, 1);
    assert_eq!(mocks.overlay.hidden.load(Ordering::SeqCst), 1);

    let log = decision_log(dir.path());
    assert!(log.contains("stopped by user"));
    assert!(log.contains("Session stats"));
}

// ---------------------------------------------------------------------------
// Control
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn test_restart_mid_enhancing_wait_aborts_quickly() {
    let dir = tempdir().unwrap();
    let mut cfg = MacroConfig::default();
    cfg.slow_start_level = 1;
    cfg.slow_delay = 30.0;
    let (mut engine, mocks, control) = engine(&cfg, dir.path());

    mocks.ocr.push([enhanced(1), enhanced(2)]);

    let restarter = control.clone();
    let started = Instant::now();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(10)).await;
        restarter.request_restart();
    });

    let first = engine.run(&RunPlan::reach_level(10, ANCHOR)).await;
    let stopped_after = started.elapsed();

    assert_eq!(first.outcome, RunOutcome::Restarted);
    assert_eq!(first.summary.enhance_ok, 1);
    assert!(stopped_after >= Duration::from_secs(10));
    assert!(stopped_after <= Duration::from_millis(10_100));
    assert_eq!(mocks.ocr.remaining(), 1);
    assert_eq!(mocks.overlay.hidden.load(Ordering::SeqCst), 1);
    assert!(decision_log(dir.path()).contains("restarting..."));
    assert!(!decision_log(dir.path()).contains("Session stats"));

    // the next run starts from zero with the restart flag cleared
    mocks.ocr.push([enhanced(10)]);
    let second = engine.run(&RunPlan::reach_level(10, ANCHOR)).await;

    assert_eq!(second.outcome, RunOutcome::Stopped(StopReason::GoalReached));
    assert_eq!(second.summary.enhance_ok, 2);
    assert_ne!(first.run_id, second.run_id);
    assert_eq!(engine.config(), &cfg);
    assert_eq!(mocks.overlay.shown.load(Ordering::SeqCst), 2);
    assert_eq!(mocks.overlay.hidden.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_pause_holds_the_next_turn() {
    let dir = tempdir().unwrap();
    let cfg = MacroConfig::default();
    let (mut engine, mocks, control) = engine(&cfg, dir.path());

    mocks.ocr.push([enhanced(3), enhanced(10)]);

    let pauser = control.clone();
    let started = Instant::now();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        pauser.set_paused(true);
        tokio::time::sleep(Duration::from_secs(20)).await;
        pauser.set_paused(false);
    });

    let report = engine.run(&RunPlan::reach_level(10, ANCHOR)).await;
    assert_eq!(report.outcome, RunOutcome::Stopped(StopReason::GoalReached));

    let sent = mocks.input.sent.lock().unwrap().clone();
    assert_eq!(sent.len(), 2);
    let second = sent[1].2 - started;
    assert!(second >= Duration::from_secs(21));
    assert!(second <= Duration::from_millis(21_100));
}

#[tokio::test(start_paused = true)]
async fn test_pause_during_wait_holds_the_follow_up_command() {
    let dir = tempdir().unwrap();
    let cfg = MacroConfig::default();
    let (mut engine, mocks, control) = engine(&cfg, dir.path());

    mocks.ocr.push(["", "[+10] 강화 성공"]);

    let pauser = control.clone();
    let started = Instant::now();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        pauser.set_paused(true);
        tokio::time::sleep(Duration::from_secs(60)).await;
        pauser.set_paused(false);
    });

    engine.run(&RunPlan::mine_gold(&cfg, ANCHOR)).await;

    let sent = mocks.input.sent.lock().unwrap().clone();
    assert_eq!(sent[0].0, "/판매");
    assert_eq!(sent[0].2 - started, Duration::ZERO);
    assert_eq!(sent[1].0, "/강화");
    let follow_up = sent[1].2 - started;
    assert!(follow_up >= Duration::from_secs(61), "typed while paused at {follow_up:?}");
    assert!(follow_up <= Duration::from_millis(61_100));
}

#[tokio::test(start_paused = true)]
async fn test_pause_between_read_and_effect_send() {
    let dir = tempdir().unwrap();
    let cfg = MacroConfig::default();
    let (mut engine, mocks, control) = engine(&cfg, dir.path());

    // the empty screen makes the machine queue an enhance right away
    mocks.ocr.push([""]);
    mocks.ocr.pause_after_read.store(1, Ordering::SeqCst);

    let resumer = control.clone();
    let started = Instant::now();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(30)).await;
        resumer.set_paused(false);
    });

    engine.run(&RunPlan::mine_gold(&cfg, ANCHOR)).await;

    let sent = mocks.input.sent.lock().unwrap().clone();
    assert_eq!(sent[1].0, "/강화");
    let follow_up = sent[1].2 - started;
    assert!(follow_up >= Duration::from_secs(30));
    assert!(follow_up <= Duration::from_millis(30_100));
}

#[tokio::test(start_paused = true)]
async fn test_termination_mid_run_still_cleans_up() {
    let dir = tempdir().unwrap();
    let mut cfg = MacroConfig::default();
    cfg.fast_delay = 30.0;
    let (mut engine, mocks, control) = engine(&cfg, dir.path());

    mocks.ocr.push([enhanced(1), enhanced(2)]);

    let started = Instant::now();
    let stop = tokio::time::sleep(Duration::from_secs(10));
    let (report, fired) = control
        .interrupt_on(engine.run(&RunPlan::reach_level(10, ANCHOR)), stop)
        .await;

    assert!(fired);
    assert_eq!(report.outcome, RunOutcome::Interrupted);
    assert!(started.elapsed() <= Duration::from_millis(10_100));
    assert_eq!(mocks.overlay.hidden.load(Ordering::SeqCst), 1);

    let log = decision_log(dir.path());
    assert!(log.contains("stopped by user"));
    assert!(log.contains("Session stats"));
}

#[tokio::test(start_paused = true)]
async fn test_failed_input_skips_turn_and_continues() {
    let dir = tempdir().unwrap();
    let cfg = MacroConfig::default();
    let (mut engine, mocks, _control) =
        engine_with(&cfg, dir.path(), |m| m.input.clipboard_broken = true);

    mocks.ocr.push([enhanced(10)]);

    let report = engine.run(&RunPlan::reach_level(10, ANCHOR)).await;
    assert_eq!(report.outcome, RunOutcome::Stopped(StopReason::GoalReached));
    assert!(mocks.input.commands().is_empty());
    assert!(decision_log(dir.path()).contains("input failed - turn skipped"));
}
