use anyhow::{Result, anyhow};
use log::{info, warn};
use pico_args::Arguments;
use signal_hook::consts::{SIGINT, SIGTERM};
use std::{
    env, fs,
    path::PathBuf,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::Duration,
};

use touchmux::{Config, Frame, TouchMux, config, input};

pub fn run() -> Result<()> {
    let mut pargs = Arguments::from_env();

    // No args -> general help
    if env::args().len() == 1 {
        print_help();
        return Ok(());
    }

    if pargs.contains("-h") || pargs.contains("--help") {
        print_help();
        return Ok(());
    }

    let mut cfg = match pargs.opt_value_from_str::<_, PathBuf>("--config")? {
        Some(p) => Config::load_from(&p)?,
        None => Config::load()?,
    };
    if let Some(dir) = pargs.opt_value_from_str::<_, PathBuf>("--device-dir")? {
        cfg.device_dir = dir;
    }

    // First free arg is the subcommand
    let subcmd: Option<String> = pargs.free_from_str().ok();

    match subcmd.as_deref() {
        Some("help") => {
            let topic: Option<String> = pargs.free_from_str().ok();
            if let Some(t) = topic {
                print_subcmd_help(&t);
            } else {
                print_help();
            }
            Ok(())
        }

        Some("list") => {
            if let Some(screen) = pargs.opt_value_from_str("--screen")? {
                cfg.screen = Some(screen);
            }
            let mux = TouchMux::open(&cfg)?;
            let screens = mux.screen_ids();
            println!("{} screen(s) connected", screens.count());
            for id in &screens.ids {
                println!("  {id}");
            }
            mux.close();
            Ok(())
        }

        Some("watch") => {
            if let Some(screen) = pargs.opt_value_from_str("--screen")? {
                cfg.screen = Some(screen);
            }
            if let Some(n) = pargs.opt_value_from_str("--capacity")? {
                cfg.capacity = n;
            }
            if let Some(ms) = pargs.opt_value_from_str("--interval")? {
                cfg.poll_interval_ms = ms;
            }
            let json = pargs.contains("--json");
            cfg.validate()?;
            watch(&cfg, json)
        }

        Some("doctor") => {
            print_response(&doctor_report(&cfg));
            Ok(())
        }

        Some(other) => Err(anyhow!("unknown subcommand: {other} (try `touchmux help`)")),

        None => {
            print_help();
            Ok(())
        }
    }
}

fn watch(cfg: &Config, json: bool) -> Result<()> {
    let stop = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(SIGINT, Arc::clone(&stop))?;
    signal_hook::flag::register(SIGTERM, Arc::clone(&stop))?;

    let mut mux = TouchMux::open(cfg)?;
    let screens = mux.screen_ids();
    info!(
        "watching {} screen(s): {}",
        screens.count(),
        screens
            .ids
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    );

    let interval = Duration::from_millis(cfg.poll_interval_ms);
    let mut last: Option<Frame> = None;
    let mut result = Ok(());
    while !stop.load(Ordering::Relaxed) {
        let frame = match mux.update() {
            Ok(f) => f,
            Err(e) => {
                result = Err(e.into());
                break;
            }
        };
        if last.as_ref() != Some(&frame) {
            print_frame(&frame, json);
            last = Some(frame);
        }
        thread::sleep(interval);
    }

    for (id, stats) in mux.device_stats() {
        info!(
            "{id}: {} packets, {} resyncs, {} out-of-range events",
            stats.packets, stats.resyncs, stats.out_of_range_events
        );
    }
    if mux.dropped_touches() > 0 {
        warn!(
            "{} touches were hidden by the capacity split; raise --capacity",
            mux.dropped_touches()
        );
    }
    mux.close();
    result
}

fn print_frame(frame: &Frame, json: bool) {
    if json {
        let active: Vec<_> = frame
            .active()
            .map(|(slot, p)| {
                serde_json::json!({
                    "slot": slot,
                    "screen": p.screen,
                    "id": p.wire_tracking_id(),
                    "x": p.x,
                    "y": p.y,
                })
            })
            .collect();
        println!("{}", serde_json::Value::Array(active));
        return;
    }
    println!("------------------");
    for (slot, p) in frame.active() {
        println!(
            "[{slot}]: X: {:1.2}, Y: {:1.2} ({}, {})",
            p.x,
            p.y,
            p.wire_tracking_id(),
            p.screen
        );
    }
}

fn doctor_report(cfg: &Config) -> serde_json::Value {
    let dir_readable = fs::read_dir(&cfg.device_dir).is_ok();
    let candidates = match input::inspect(&cfg.device_dir) {
        Ok(v) => serde_json::json!(v),
        Err(e) => serde_json::json!({ "error": e.to_string() }),
    };
    serde_json::json!({
        "device_dir": cfg.device_dir,
        "device_dir_readable": dir_readable,
        "input_group_member": check_in_input_group(),
        "config_path": config::config_path(),
        "config": cfg,
        "candidates": candidates,
        "hints": {
            "add_user_to_input_group": "sudo usermod -aG input $USER && newgrp input"
        }
    })
}

fn check_in_input_group() -> bool {
    let Ok(s) = fs::read_to_string("/etc/group") else {
        return false;
    };
    let user = whoami::username();
    s.lines()
        .filter(|line| line.starts_with("input:"))
        .any(|line| {
            line.split(':')
                .nth(3)
                .unwrap_or("")
                .split(',')
                .any(|u| u == user)
        })
}

fn print_help() {
    println!(
        r#"touchmux — merged multitouch feed for one or more touchscreens

USAGE:
  touchmux help [command]          Show general or command-specific help
  touchmux list [--screen ID]      List attached screens
  touchmux watch [OPTIONS]         Print active touches until interrupted
  touchmux doctor                  Diagnose permissions/devices

GLOBAL OPTIONS:
  --config PATH                    Config file (default ~/.config/touchmux/config.toml)
  --device-dir DIR                 Where to look for eventN nodes (default /dev/input)

WATCH OPTIONS:
  --screen ID                      Only attach the screen with this identity
  --capacity N                     External touch slots shared by all screens
  --interval MS                    Poll interval in milliseconds
  --json                           One JSON array per changed frame
"#
    );
}

fn print_subcmd_help(cmd: &str) {
    match cmd {
        "list" => println!(
            "usage: touchmux list [--screen ID]\nAttaches every multitouch screen (or only ID) and prints their identities."
        ),
        "watch" => println!(
            "usage: touchmux watch [--screen ID] [--capacity N] [--interval MS] [--json]\nPolls all screens and prints active touches whenever they change. Ctrl-C stops."
        ),
        "doctor" => println!(
            "usage: touchmux doctor\nChecks permissions and lists every input node with its multitouch verdict."
        ),
        _ => {
            eprintln!("unknown command: {cmd}\n");
            print_help();
        }
    }
}

fn print_response(v: &serde_json::Value) {
    println!("{}", serde_json::to_string_pretty(v).unwrap_or_default());
}
