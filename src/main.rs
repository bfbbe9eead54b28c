//! sword-macro: chat game macro entry point.
//!
//! Loads configuration, initialises structured logging, then loops a
//! text menu. Each run gets fresh collaborators and a fresh control
//! signal; the menu task listens for pause/restart lines, Ctrl+C and
//! SIGTERM while a run is active. SIGTERM ends the run through its
//! cleanup and then leaves the menu.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use sword_macro::config::{MacroConfig, Setting};
use sword_macro::control::{terminate_signal, ControlSignal};
use sword_macro::engine::{Collaborators, MacroEngine, RunOutcome, RunPlan, RunReport};
use sword_macro::journal::{Journal, JournalPaths};
use sword_macro::platform::replay::{BlankCapture, LogOverlay, LoggingDesktop, ScriptedRecognizer};
use sword_macro::platform::{ClipboardInput, InputTiming, Point};

const BANNER: &str = r#"
 ____                       _
/ ___|_      _____  _ __ __| |
\___ \ \ /\ / / _ \| '__/ _` |
 ___) \ V  V / (_) | | | (_| |
|____/ \_/\_/ \___/|_|  \__,_|

  Sword growth macro
  p + Enter: pause/resume   r + Enter: restart   Ctrl+C: stop
"#;

#[derive(Parser, Debug)]
#[command(name = "sword-macro", version, about = "Sword-growth chat game macro")]
struct Cli {
    /// Config file (.toml, or a legacy .json)
    #[arg(long, env = "SWORD_MACRO_CONFIG")]
    config: Option<PathBuf>,

    /// Transcript of recorded chat screens separated by `---` lines
    #[arg(long, env = "SWORD_MACRO_REPLAY")]
    replay: Option<PathBuf>,

    /// Directory for the decision log and the event CSV
    #[arg(long, env = "SWORD_MACRO_LOG_DIR")]
    log_dir: Option<PathBuf>,

    /// Message box click point as `x,y`
    #[arg(long, value_parser = parse_point, default_value = "960,1000")]
    anchor: Point,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();
    let cli = Cli::parse();
    init_logging();

    let config_path = cli.config.clone().unwrap_or_else(MacroConfig::default_path);
    let mut cfg = MacroConfig::load(&config_path)?;
    let log_dir = cli.log_dir.clone().unwrap_or_else(JournalPaths::default_dir);

    let transcript = match &cli.replay {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read transcript {}", path.display()))?,
        None => {
            warn!("No transcript given, every screen will read empty");
            String::new()
        }
    };

    println!("{BANNER}");
    info!(
        config = %config_path.display(),
        log_dir = %log_dir.display(),
        anchor = %cli.anchor,
        "sword-macro starting up"
    );

    let mut lines = spawn_stdin_reader();

    loop {
        print_menu(&cfg);
        let Some(choice) = ask(&mut lines, "Select: ").await else {
            break;
        };

        let plan = match choice.as_str() {
            "1" => {
                let Some(target) = ask_level(&mut lines, "Target level: +").await else {
                    continue;
                };
                RunPlan::reach_level(target, cli.anchor)
            }
            "2" => {
                let Some(target) = ask_level(&mut lines, "Hidden sword target level: +").await
                else {
                    continue;
                };
                let auto = ask(&mut lines, "Sell at the goal and keep going? (y/n): ")
                    .await
                    .is_some_and(|a| a.eq_ignore_ascii_case("y"));
                RunPlan::hunt_hidden(target, auto, cli.anchor)
            }
            "3" => RunPlan::mine_gold(&cfg, cli.anchor),
            "4" => {
                settings_menu(&mut lines, &mut cfg, &config_path).await;
                continue;
            }
            "0" => break,
            other => {
                println!("Unknown choice: {other}");
                continue;
            }
        };

        let (report, terminated) = run_once(&cfg, &transcript, &log_dir, &plan, &mut lines).await;
        print_report(&report);
        if terminated {
            break;
        }

        if report.outcome == RunOutcome::Restarted {
            continue;
        }
        match ask(&mut lines, "R + Enter to restart, anything else to quit: ").await {
            Some(a) if a.eq_ignore_ascii_case("r") => continue,
            _ => break,
        }
    }

    info!("sword-macro shut down cleanly.");
    Ok(())
}

/// One run with fresh collaborators. Keyboard lines, Ctrl+C and SIGTERM
/// are turned into control flags until the run returns. The flag is set
/// when the process was asked to terminate.
async fn run_once(
    cfg: &MacroConfig,
    transcript: &str,
    log_dir: &Path,
    plan: &RunPlan,
    lines: &mut mpsc::UnboundedReceiver<String>,
) -> (RunReport, bool) {
    let control = ControlSignal::new();
    let io = replay_collaborators(cfg, transcript, &control);
    let journal = Journal::new(JournalPaths::in_dir(log_dir));
    let mut engine = MacroEngine::new(cfg.clone(), io, journal, control.clone());

    let run = control.interrupt_on(engine.run(plan), terminate_signal());
    tokio::pin!(run);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    let mut stdin_open = true;
    let mut shutdown_seen = false;

    loop {
        tokio::select! {
            finished = &mut run => return finished,
            line = lines.recv(), if stdin_open => match line.as_deref().map(str::trim) {
                Some("p") | Some("P") => {
                    let paused = control.toggle_pause();
                    println!("{}", if paused { "Paused." } else { "Resumed." });
                }
                Some("r") | Some("R") => {
                    println!("Restarting...");
                    control.request_restart();
                }
                Some(_) => {}
                None => stdin_open = false,
            },
            _ = &mut shutdown, if !shutdown_seen => {
                shutdown_seen = true;
                info!("Interrupt received.");
                control.interrupt();
            }
        }
    }
}

fn replay_collaborators(cfg: &MacroConfig, transcript: &str, control: &ControlSignal) -> Collaborators {
    Collaborators {
        capture: Box::new(BlankCapture),
        recognizer: Box::new(
            ScriptedRecognizer::from_transcript(transcript).stop_when_exhausted(control.clone()),
        ),
        input: Box::new(ClipboardInput::new(
            LoggingDesktop::new(),
            InputTiming::from_config(cfg),
            control.clone(),
        )),
        overlay: Box::new(LogOverlay),
    }
}

fn print_report(report: &RunReport) {
    let headline = match &report.outcome {
        RunOutcome::Stopped(reason) => format!("Stopped: {reason}"),
        RunOutcome::Restarted => "Restarted".to_string(),
        RunOutcome::Interrupted => "Stopped by user".to_string(),
        RunOutcome::Failed(e) => format!("Error: {e}"),
    };
    println!("\n{headline}");
    if report.outcome != RunOutcome::Restarted {
        println!("{}", report.summary);
    }
    info!(run_id = %report.run_id, outcome = ?report.outcome, "Run complete");
}

// ---------------------------------------------------------------------------
// Menus
// ---------------------------------------------------------------------------

fn print_menu(cfg: &MacroConfig) {
    println!();
    println!("  1. Reach a target level");
    println!("  2. Hunt a hidden sword");
    println!("  3. Mine gold (sell at +{})", cfg.gold_mine_target);
    println!("  4. Settings");
    println!("  0. Quit");
}

async fn settings_menu(
    lines: &mut mpsc::UnboundedReceiver<String>,
    cfg: &mut MacroConfig,
    path: &Path,
) {
    loop {
        println!();
        for (i, setting) in Setting::ALL.iter().enumerate() {
            println!("  {}. {:<32} {}", i + 1, setting.label(), setting.current(cfg));
        }
        let fixed = match cfg.fixed_position() {
            Some((x, y, _)) => format!("on ({x}, {y})"),
            None => "off".to_string(),
        };
        println!("  {}. {:<32} {fixed}", Setting::ALL.len() + 1, "Fixed click position");
        println!("  0. Back");

        let Some(choice) = ask(lines, "Select: ").await else {
            return;
        };
        let Ok(n) = choice.parse::<usize>() else {
            println!("Unknown choice: {choice}");
            continue;
        };

        let changed = if n == 0 {
            return;
        } else if let Some(setting) = Setting::ALL.get(n - 1) {
            let Some(raw) = ask(lines, &format!("{}: ", setting.label())).await else {
                return;
            };
            match setting.apply(cfg, &raw) {
                Ok(()) => true,
                Err(e) => {
                    println!("{e}");
                    false
                }
            }
        } else if n == Setting::ALL.len() + 1 {
            toggle_fixed_position(lines, cfg).await
        } else {
            println!("Unknown choice: {choice}");
            false
        };

        if changed {
            if let Err(e) = cfg.save(path) {
                error!(error = %e, "Failed to save config");
            }
        }
    }
}

/// Turn the fixed click position off, or ask for one and turn it on.
async fn toggle_fixed_position(
    lines: &mut mpsc::UnboundedReceiver<String>,
    cfg: &mut MacroConfig,
) -> bool {
    if cfg.use_fixed_pos {
        cfg.use_fixed_pos = false;
        println!("Fixed position off; the anchor is used.");
        return true;
    }
    let Some(raw) = ask(lines, "Click point x,y: ").await else {
        return false;
    };
    let point = match parse_point(&raw) {
        Ok(p) => p,
        Err(e) => {
            println!("{e}");
            return false;
        }
    };
    let start_y = ask(lines, "Capture top y (blank = derive): ")
        .await
        .and_then(|s| s.parse::<i32>().ok());

    cfg.use_fixed_pos = true;
    cfg.fixed_x = Some(point.x);
    cfg.fixed_y = Some(point.y);
    cfg.fixed_start_y = start_y;
    true
}

// ---------------------------------------------------------------------------
// Console input
// ---------------------------------------------------------------------------

/// Forward stdin lines to a channel so the menu and the run loop can
/// both select on them.
fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        let mut reader = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = reader.next_line().await {
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

/// Print a prompt and wait for the next line. `None` on end of input
/// or Ctrl+C.
async fn ask(lines: &mut mpsc::UnboundedReceiver<String>, prompt: &str) -> Option<String> {
    use std::io::Write;
    print!("{prompt}");
    let _ = std::io::stdout().flush();
    tokio::select! {
        line = lines.recv() => line.map(|l| l.trim().to_string()),
        _ = tokio::signal::ctrl_c() => None,
        _ = terminate_signal() => None,
    }
}

async fn ask_level(lines: &mut mpsc::UnboundedReceiver<String>, prompt: &str) -> Option<u32> {
    let raw = ask(lines, prompt).await?;
    match raw.trim_start_matches('+').parse::<u32>() {
        Ok(level) if level > 0 => Some(level),
        _ => {
            println!("Not a level: {raw}");
            None
        }
    }
}

fn parse_point(raw: &str) -> Result<Point, String> {
    let (x, y) = raw
        .split_once(',')
        .ok_or_else(|| format!("expected x,y but got {raw:?}"))?;
    let x = x.trim().parse().map_err(|_| format!("bad x in {raw:?}"))?;
    let y = y.trim().parse().map_err(|_| format!("bad y in {raw:?}"))?;
    Ok(Point::new(x, y))
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("sword_macro=info"));

    let json_logging = std::env::var("SWORD_MACRO_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
