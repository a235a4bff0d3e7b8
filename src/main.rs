use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use log::{error, info, warn};
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use abxbench::ab::AbTestParams;
use abxbench::abx::{AbxChoice, AbxTestParams, Guess, GuessOutcome};
use abxbench::clock::MonotonicClock;
use abxbench::config::{ws_url, SystemConfig};
use abxbench::controller::{Bench, BenchEvent};
use abxbench::random::RngSource;
use abxbench::simulation::SimulatedAmp;
use abxbench::status::{InputSource, PresetId};
use abxbench::traits::Transport;
use abxbench::view::View;
use abxbench::ws::WsTransport;

/// Host that always gets the simulated amplifier.
const LOCAL_DEV_HOST: &str = "127.0.0.1";

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Amplifier host name or address
    #[arg(long)]
    host: Option<String>,

    /// Answer locally instead of talking to an amplifier
    #[arg(long, default_value_t = false)]
    simulate: bool,

    /// JSON config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Seed for the ABX draw, for repeatable sessions
    #[arg(long)]
    seed: Option<u64>,
}

/// One line typed at the prompt.
#[derive(Parser, Debug)]
#[command(no_binary_name = true, disable_help_flag = true)]
struct Line {
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Switch the active preset
    Preset { preset: PresetId },
    /// Set volume in dB
    Volume {
        #[arg(allow_negative_numbers = true)]
        db: i32,
    },
    Mute { state: Toggle },
    Eq { preset: PresetId, state: Toggle },
    /// Route an input code (0 scan, 1 XLR, 2 RCA, 4 SPDIF, 5 AES, 6 OPT, 7 EXT) to a preset
    Source { preset: PresetId, code: u8 },
    #[command(subcommand)]
    Ab(AbCmd),
    #[command(subcommand)]
    Abx(AbxCmd),
    /// Print the current device state
    State,
    Quit,
}

#[derive(Subcommand, Debug)]
enum AbCmd {
    Open,
    Start {
        a: PresetId,
        b: PresetId,
        min_secs: u32,
        max_secs: u32,
        #[arg(long)]
        muted: bool,
    },
    Like,
    Stop,
    Reset,
    /// Leave test mode on the device
    Exit,
}

#[derive(Subcommand, Debug)]
enum AbxCmd {
    Open,
    Start {
        a: PresetId,
        b: PresetId,
        trials: u32,
        #[arg(long)]
        muted: bool,
    },
    Play { which: Which },
    Guess { which: Which },
    Stop,
    Reset,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Toggle {
    On,
    Off,
}

impl From<Toggle> for bool {
    fn from(t: Toggle) -> bool {
        matches!(t, Toggle::On)
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Which {
    A,
    B,
    X,
}

type LiveBench = Bench<Box<dyn Transport>, MonotonicClock, RngSource<rand::rngs::StdRng>>;

fn spawn_stdin_reader() -> Receiver<String> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            match line {
                Ok(line) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!("stdin: {}", e);
                    break;
                }
            }
        }
    });
    rx
}

fn print_state(bench: &LiveBench) {
    let dev = bench.device();
    println!("{} [{:?}] view={:?}", dev.display_name(), bench.connection_state(), bench.view());
    println!(
        "  preset={} muted={} volume={:.1} dB",
        dev.active_preset, dev.is_muted, dev.volume_db
    );
    for preset in 1..=3u8 {
        let idx = usize::from(preset - 1);
        println!(
            "  P{}: eq={} source={}",
            preset,
            if dev.eq_enabled[idx] { "on" } else { "off" },
            dev.source_label(preset)
        );
    }
}

/// Returns false when the user asked to quit.
fn run_command(bench: &mut LiveBench, cmd: Cmd) -> bool {
    let outcome: abxbench::error::Result<()> = match cmd {
        Cmd::Preset { preset } => {
            bench.set_preset(preset);
            Ok(())
        }
        Cmd::Volume { db } => {
            bench.set_volume(db);
            Ok(())
        }
        Cmd::Mute { state } => {
            bench.set_mute(state.into());
            Ok(())
        }
        Cmd::Eq { preset, state } => {
            bench.set_eq(preset, state.into());
            Ok(())
        }
        Cmd::Source { preset, code } => {
            bench.set_source(preset, InputSource::from(code));
            Ok(())
        }
        Cmd::State => {
            bench.refresh();
            print_state(bench);
            Ok(())
        }
        Cmd::Quit => return false,
        Cmd::Ab(ab) => match ab {
            AbCmd::Open => {
                bench.open_view(View::AbControl);
                Ok(())
            }
            AbCmd::Start { a, b, min_secs, max_secs, muted } => bench.start_ab(AbTestParams {
                preset_a: a,
                preset_b: b,
                muted_during_switch: muted,
                min_duration_secs: min_secs,
                max_duration_secs: max_secs,
            }),
            AbCmd::Like => bench.log_like().map(|p| println!("Liked preset {}", p)),
            AbCmd::Stop => bench.stop_ab().map(|_| ()),
            AbCmd::Reset => {
                bench.reset_ab();
                Ok(())
            }
            AbCmd::Exit => {
                bench.disable_test_mode();
                Ok(())
            }
        },
        Cmd::Abx(abx) => match abx {
            AbxCmd::Open => {
                bench.open_view(View::AbxControl);
                Ok(())
            }
            AbxCmd::Start { a, b, trials, muted } => bench.start_abx(AbxTestParams {
                preset_a: a,
                preset_b: b,
                total_trials: trials,
                muted_during_switch: muted,
            }),
            AbxCmd::Play { which } => {
                let choice = match which {
                    Which::A => AbxChoice::A,
                    Which::B => AbxChoice::B,
                    Which::X => AbxChoice::X,
                };
                bench.present_abx(choice).map(|_| println!("Playing {:?}", choice))
            }
            AbxCmd::Guess { which } => match which {
                Which::A => bench.submit_guess(Guess::A).map(report_trial),
                Which::B => bench.submit_guess(Guess::B).map(report_trial),
                Which::X => {
                    println!("X is the unknown, guess a or b");
                    Ok(())
                }
            },
            AbxCmd::Stop => bench.stop_abx().map(|_| ()),
            AbxCmd::Reset => {
                bench.reset_abx();
                Ok(())
            }
        },
    };

    if let Err(e) = outcome {
        println!("Rejected: {}", e);
    }
    true
}

fn report_trial(outcome: GuessOutcome) {
    if let GuessOutcome::NextTrial { trial } = outcome {
        println!("Trial {}", trial);
    }
}

fn report_events(bench: &mut LiveBench) {
    for event in bench.take_events() {
        match event {
            BenchEvent::ViewChanged(view) => println!("== {:?} ==", view),
            BenchEvent::PresetChanged(preset) => println!("Active preset: {}", preset),
            BenchEvent::Elapsed(display) => println!("Elapsed {}", display),
            BenchEvent::AbFinished(r) => println!(
                "AB result: preset {} = {} likes, preset {} = {} likes, {} s",
                r.preset_a, r.likes_a, r.preset_b, r.likes_b, r.elapsed_secs
            ),
            BenchEvent::AbxFinished(r) => {
                println!(
                    "ABX result: {}/{} correct, p = {:.4}",
                    r.correct, r.trials, r.p_value
                );
                println!("{}", r.interpretation());
            }
        }
    }
}

fn main() -> Result<()> {
    env_logger::builder()
        .format_timestamp(None)
        .filter_level(log::LevelFilter::Info)
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => SystemConfig::load(path)?,
        None => SystemConfig::default(),
    };
    if let Some(host) = &args.host {
        config.channel.url = ws_url(host);
        if host == LOCAL_DEV_HOST {
            config.channel.simulate = true;
        }
    }
    if args.simulate {
        config.channel.simulate = true;
    }

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();

    ctrlc::set_handler(move || {
        info!("Ctrl+C received. Shutting down...");
        r.store(false, Ordering::SeqCst);
    })?;

    let transport: Box<dyn Transport> = if config.channel.simulate {
        Box::new(SimulatedAmp::new())
    } else {
        Box::new(WsTransport::new(
            &config.channel.url,
            Duration::from_millis(config.channel.connect_timeout_ms),
        ))
    };
    let rng = match args.seed {
        Some(seed) => RngSource::seeded(seed),
        None => RngSource::from_os(),
    };

    let mut bench = Bench::new(transport, MonotonicClock::new(), rng, config);
    bench.connect();

    let input = spawn_stdin_reader();
    info!("Ready. Type a command (preset, volume, mute, eq, source, ab, abx, state, quit).");

    while running.load(Ordering::SeqCst) {
        match input.try_recv() {
            Ok(line) if line.trim().is_empty() => {}
            Ok(line) => match Line::try_parse_from(line.split_whitespace()) {
                Ok(parsed) => {
                    if !run_command(&mut bench, parsed.cmd) {
                        break;
                    }
                }
                Err(e) => println!("{}", e),
            },
            Err(TryRecvError::Empty) => {}
            Err(TryRecvError::Disconnected) => {
                error!("stdin closed");
                break;
            }
        }

        bench.process_loop_iteration();
        report_events(&mut bench);

        thread::sleep(Duration::from_millis(1));
    }

    bench.disconnect();
    info!("Exiting.");
    Ok(())
}
