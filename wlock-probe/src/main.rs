//! Command line driver: runs the two-context protocol once, or hammers the
//! lock from many threads.
//!
//! Log verbosity follows the `LOG` environment variable.

mod contend;

use std::process;
use std::time::Duration;

use clap::{value_t, App, AppSettings, Arg, ArgMatches, SubCommand};
use wlock::config::{
    ACQUIRE_WAIT_MS, CONTROL_TICK_MS, FAIL_WAIT_MS, LOCK_CELL_OFFSET, PHASE_CELL_OFFSET,
    RENDER_QUANTUM_FRAMES, SAMPLE_RATE, SCENARIO_TIMEOUT_MS,
};
use wlock::io::console::Color;
use wlock::io::DiagnosticStyle;
use wlock::scenario::{run_scenario, ScenarioConfig};
use wlock::CellOffsets;

use contend::{run_contention, ContentionConfig};

fn main() {
    let fail_wait = FAIL_WAIT_MS.to_string();
    let acquire_wait = ACQUIRE_WAIT_MS.to_string();
    let tick = CONTROL_TICK_MS.to_string();
    let frames = RENDER_QUANTUM_FRAMES.to_string();
    let rate = SAMPLE_RATE.to_string();
    let timeout = SCENARIO_TIMEOUT_MS.to_string();
    let lock_offset = LOCK_CELL_OFFSET.to_string();
    let phase_offset = PHASE_CELL_OFFSET.to_string();

    let matches = App::new("wlock-probe")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Exercises the shared-word spinlock across threads")
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .arg(
            Arg::with_name("style")
                .long("style")
                .takes_value(true)
                .possible_values(&["colored", "plain"])
                .default_value("colored")
                .help("Log line decoration"),
        )
        .subcommand(
            SubCommand::with_name("scenario")
                .about("Runs render and control contexts through every phase")
                .arg(number("fail-wait-ms", &fail_wait, "Budget that must time out"))
                .arg(number("acquire-wait-ms", &acquire_wait, "Budget that must succeed"))
                .arg(number("tick-ms", &tick, "Control loop period"))
                .arg(number("quantum-frames", &frames, "Frames per render callback"))
                .arg(number("sample-rate", &rate, "Render sample rate"))
                .arg(number("timeout-ms", &timeout, "Give up after this long"))
                .arg(number("lock-offset", &lock_offset, "Byte offset of the lock cell"))
                .arg(number("phase-offset", &phase_offset, "Byte offset of the phase cell")),
        )
        .subcommand(
            SubCommand::with_name("contend")
                .about("Many threads taking the same lock cell")
                .arg(number("threads", "4", "Worker count"))
                .arg(number("iterations", "1000", "Acquisitions per worker"))
                .arg(number("max-hold-us", "50", "Longest random hold"))
                .arg(number("wait-ms", &acquire_wait, "Busy-wait budget per acquisition")),
        )
        .get_matches();

    let style = value_t!(matches, "style", DiagnosticStyle).unwrap_or_else(|e| e.exit());
    if let Err(err) = wlock::io::logging::init(style) {
        eprintln!("logger: {}", err);
    }

    let outcome = match matches.subcommand() {
        ("scenario", Some(sub)) => scenario(sub),
        ("contend", Some(sub)) => contend(sub),
        _ => unreachable!("clap requires a subcommand"),
    };
    verdict(style, &outcome);
    if outcome.is_err() {
        process::exit(1);
    }
}

fn verdict(style: DiagnosticStyle, outcome: &Result<(), String>) {
    match (style, outcome) {
        (DiagnosticStyle::Colored, Ok(())) => wlock::color_println!(Color::Green, "PASS"),
        (DiagnosticStyle::Colored, Err(reason)) => {
            wlock::color_print!(Color::Red, "FAIL");
            println!(": {}", reason);
        }
        (DiagnosticStyle::Plain, Ok(())) => println!("PASS"),
        (DiagnosticStyle::Plain, Err(reason)) => println!("FAIL: {}", reason),
    }
}

fn number<'a>(name: &'a str, default: &'a str, help: &'a str) -> Arg<'a, 'a> {
    Arg::with_name(name)
        .long(name)
        .takes_value(true)
        .default_value(default)
        .help(help)
}

fn scenario(matches: &ArgMatches) -> Result<(), String> {
    let frames = value_t!(matches, "quantum-frames", u64).unwrap_or_else(|e| e.exit());
    let rate = value_t!(matches, "sample-rate", u64).unwrap_or_else(|e| e.exit());
    if rate == 0 {
        return Err("sample rate must be positive".into());
    }
    let config = ScenarioConfig {
        offsets: CellOffsets {
            lock: value_t!(matches, "lock-offset", usize).unwrap_or_else(|e| e.exit()),
            phase: value_t!(matches, "phase-offset", usize).unwrap_or_else(|e| e.exit()),
        },
        fail_wait_ms: value_t!(matches, "fail-wait-ms", f64).unwrap_or_else(|e| e.exit()),
        acquire_wait_ms: value_t!(matches, "acquire-wait-ms", f64).unwrap_or_else(|e| e.exit()),
        control_tick: Duration::from_millis(
            value_t!(matches, "tick-ms", u64).unwrap_or_else(|e| e.exit()),
        ),
        render_quantum: Duration::from_micros(frames * 1_000_000 / rate),
        timeout: Duration::from_millis(
            value_t!(matches, "timeout-ms", u64).unwrap_or_else(|e| e.exit()),
        ),
    };

    let report = run_scenario(&config).map_err(|err| err.to_string())?;
    println!("phases:        {:?}", report.trace);
    println!("elapsed:       {:.3} ms", report.elapsed_ms);
    if let Some(waited) = report.acquire_wait_ms {
        println!("acquire wait:  {:.3} ms", waited);
    }
    println!("render turns:  {}", report.render_turns);
    println!("control turns: {}", report.control_turns);
    Ok(())
}

fn contend(matches: &ArgMatches) -> Result<(), String> {
    let config = ContentionConfig {
        threads: value_t!(matches, "threads", usize).unwrap_or_else(|e| e.exit()),
        iterations: value_t!(matches, "iterations", u64).unwrap_or_else(|e| e.exit()),
        max_hold_us: value_t!(matches, "max-hold-us", u64).unwrap_or_else(|e| e.exit()),
        wait_ms: value_t!(matches, "wait-ms", f64).unwrap_or_else(|e| e.exit()),
    };

    let report = run_contention(&config).map_err(|err| err.to_string())?;
    println!("acquired:      {}", report.acquired);
    println!("timed out:     {}", report.timed_out);
    println!("counter:       {}", report.counter);
    println!("max occupancy: {}", report.max_occupancy);
    if !report.is_exclusive() {
        return Err("holders overlapped".into());
    }
    Ok(())
}
