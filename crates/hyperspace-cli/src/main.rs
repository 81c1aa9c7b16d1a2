//! `hyperspace-cli` – runs a scene headless on simulated hardware.
//!
//! 1. Loads `~/.hyperspace/config.toml`, or the built-in demo scene when the
//!    file is absent.  `hyperspace init` writes the demo scene to that path.
//! 2. Builds the scene and opens the shutter controller.
//! 3. Runs the frame loop at `frame_rate` until Ctrl-C or `max_frames`.
//! 4. Resets the shutter controller on the way out.

mod config;

use colored::Colorize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

use hyperspace_runtime::{FrameScheduler, Hardware, init_tracing};

fn main() {
    if std::env::args().nth(1).as_deref() == Some("init") {
        write_demo_config();
        return;
    }

    let (cfg, source) = match config::load() {
        Ok(Some(cfg)) => (cfg, config::config_path().display().to_string()),
        Ok(None) => {
            let mut cfg = config::Config::default();
            config::apply_env_overrides(&mut cfg);
            (cfg, "built-in demo scene".to_string())
        }
        Err(e) => {
            eprintln!("{}: {}", "Config error".red(), e);
            std::process::exit(1);
        }
    };

    let _guard = init_tracing("hyperspace", cfg.log_format);
    print_banner();
    println!("  Scene: {}", source.bold());

    // ── Shared shutdown flag ──────────────────────────────────────────────
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received – stopping frame loop …".yellow().bold());
        shutdown_clone.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; stop with max_frames instead");
    }

    // ── Scene ─────────────────────────────────────────────────────────────
    let hardware = Hardware::from(cfg.setup.simulated_hardware());
    let mut scheduler = match cfg.setup.build(hardware) {
        Ok(scheduler) => scheduler,
        Err(e) => {
            eprintln!("{}: {}", "Scene error".red(), e);
            std::process::exit(1);
        }
    };
    if let Err(e) = scheduler.initialize() {
        warn!(error = %e, "shutter controller unavailable; glasses will not be programmed");
    }

    println!(
        "  {} user(s), {} display(s), {} portal(s) at {} fps\n",
        scheduler.users().len(),
        scheduler.slots().displays().len(),
        scheduler.portals().len(),
        cfg.frame_rate
    );

    let frames = run(&mut scheduler, cfg.frame_rate, cfg.max_frames, &shutdown);

    if let Err(e) = scheduler.shutdown() {
        warn!(error = %e, "shutter reset failed");
    }
    println!("{}", format!("  ✓ Stopped after {frames} frame(s).").green());
}

/// Fixed-step loop.  Returns the number of frames run.
fn run(scheduler: &mut FrameScheduler, frame_rate: u32, max_frames: Option<u64>, shutdown: &AtomicBool) -> u64 {
    let dt = Duration::from_secs_f64(1.0 / f64::from(frame_rate.max(1)));

    while !shutdown.load(Ordering::SeqCst) {
        if max_frames.is_some_and(|max| scheduler.frame() >= max) {
            break;
        }
        let started = Instant::now();
        match scheduler.tick(dt) {
            Ok(report) => {
                for (navigation, portal) in &report.transits {
                    info!(%navigation, %portal, frame = report.frame, "transit");
                }
                if let Some(upload) = &report.upload {
                    info!(
                        frame = report.frame,
                        immediate = upload.immediate.len(),
                        deferred = upload.deferred.len(),
                        idle = upload.idle.len(),
                        "slots uploaded"
                    );
                }
            }
            Err(e) => {
                error!(error = %e, "frame loop stopped");
                break;
            }
        }
        if let Some(rest) = dt.checked_sub(started.elapsed()) {
            std::thread::sleep(rest);
        }
    }

    scheduler.frame()
}

fn write_demo_config() {
    let path = config::config_path();
    if path.exists() {
        println!("  {} already exists, leaving it alone.", path.display().to_string().bold());
        return;
    }
    match config::save(&config::Config::default()) {
        Ok(()) => println!("  {} Demo scene written to {}", "✓".green().bold(), path.display().to_string().bold()),
        Err(e) => {
            eprintln!("{}: {}", "Error saving config".red(), e);
            std::process::exit(1);
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("{}", r#"   __ __                                          "#.bold().cyan());
    println!("{}", r#"  / // /_ _____  ___ _______ ___  ___ ________   "#.bold().cyan());
    println!("{}", r#" / _  / // / _ \/ -_) __(_-</ _ \/ _ `/ __/ -_)  "#.bold().cyan());
    println!("{}", r#"/_//_/\_, / .__/\__/_/ /___/ .__/\_,_/\__/\__/   "#.bold().cyan());
    println!("{}", r#"     /___/_/              /_/                     "#.bold().cyan());
    println!();
    println!("  {} {}", "Hyperspace".bold(), format!("v{}", env!("CARGO_PKG_VERSION")).dimmed());
    println!("  Multi-user VR navigation and shutter-glasses scheduling");
    println!();
}
