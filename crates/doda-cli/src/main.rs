//! `doda` – play the gift game with Doda the dodo robot.
//!
//! On start the binary:
//!
//! 1. Loads `~/.doda/config.toml`, running a **First-Run Wizard** when the
//!    file is absent.
//! 2. Opens the saved game and preference table from the data directory.
//! 3. Builds the hardware registry: a simulated SO-101 arm and drive base,
//!    plus a snapshot camera when one is configured.
//! 4. Drops the user into an **interactive REPL**.
//! 5. Intercepts **Ctrl-C** to hold every actuator and exit.

mod config;
mod ollama;
mod repl;

use colored::Colorize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{info, warn};

use doda_game::GameSession;
use doda_hal::{HardwareRegistry, SimRegistry, SnapshotCamera};
use doda_runtime::{GiftLoop, GiftLoopConfig, LlmDriver, ReasoningEvaluator, VisionClassifier};
use doda_types::BehaviorKind;

fn main() {
    let _telemetry = doda_runtime::init_tracing("doda");

    print_banner();

    let cfg = match config::load() {
        Ok(Some(cfg)) => {
            println!(
                "  Config loaded from {}",
                config::config_path().display().to_string().bold()
            );
            cfg
        }
        Ok(None) => run_first_run_wizard(),
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            println!("  Using default configuration.");
            let mut cfg = config::Config::default();
            config::apply_env_overrides(&mut cfg);
            cfg
        }
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("{}: {}", "Failed to start async runtime".red(), e);
            return;
        }
    };

    // ── Game ──────────────────────────────────────────────────────────────
    let game = cfg.game_config();
    let session = GameSession::open(&game);
    let status = session.status();
    info!(level = status.level, gifts = status.gift_count, "game opened");
    println!(
        "  Game data in {}  (gratification {}, {} gift(s))",
        cfg.data_dir().display().to_string().bold(),
        status.level,
        status.gift_count
    );

    // ── Hardware ──────────────────────────────────────────────────────────
    let hardware = build_hardware(&cfg);

    // ── Models ────────────────────────────────────────────────────────────
    let llm = || LlmDriver::new(&cfg.llm_url, &cfg.model).with_api_key(cfg.api_key.expose());
    let loop_config = GiftLoopConfig {
        timeout: cfg.timeout(),
        camera_id: None,
        snapshot_dir: cfg.photo_dir(),
        react: true,
    };
    let mut gift_loop = GiftLoop::new(
        session,
        hardware,
        Box::new(VisionClassifier::new(llm())),
        loop_config,
    );
    if cfg.reasoning {
        gift_loop = gift_loop.with_evaluator(Box::new(ReasoningEvaluator::new(llm())));
    }

    print!("\n  Probing model server at {} … ", cfg.llm_url.dimmed());
    match ollama::fetch_models(&cfg.llm_url) {
        Ok(models) if models.iter().any(|m| m.answers_to(&cfg.model)) => {
            println!("{} ({} ready)", "online".green(), cfg.model.bold());
        }
        Ok(_) => {
            println!("{}", "online".green());
            println!(
                "  {}  Run `{}` before presenting gifts.",
                format!("Model '{}' is not installed.", cfg.model).yellow(),
                format!("ollama pull {}", cfg.model).bold()
            );
        }
        Err(_) => {
            println!("{}", "offline".yellow());
            println!(
                "  {}  {} and {} still work.",
                "Gift photos cannot be classified.".dimmed(),
                "/describe".bold(),
                "/dodo".bold()
            );
        }
    }

    // ── Ctrl-C handler ────────────────────────────────────────────────────
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = Arc::clone(&shutdown);
    let hardware_ref = gift_loop.hardware();
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received – stopping Doda …".yellow().bold());
        repl::hold_all(&hardware_ref);
        shutdown_clone.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; actuators will not be held on Ctrl-C");
    }

    runtime.block_on(gift_loop.run_behavior(BehaviorKind::Greeting));

    println!();
    println!("  Type {} for a list of commands.\n", "/help".bold().cyan());

    repl::run(repl::Shell {
        gift_loop,
        runtime,
        cfg,
        shutdown,
    });
}

fn build_hardware(cfg: &config::Config) -> HardwareRegistry {
    let registry = SimRegistry::new()
        .with_so101_arm()
        .with_drive_base()
        .with_time_scale(cfg.time_scale);

    match &cfg.camera_snapshot {
        Some(path) => {
            let mut camera = SnapshotCamera::new("snapshot", path);
            if let Some(secs) = cfg.snapshot_max_age_secs {
                camera = camera.with_max_age(Duration::from_secs(secs));
            }
            println!("  Camera: snapshots from {}", path.display().to_string().bold());
            registry.with_camera_driver(Box::new(camera)).build()
        }
        None => {
            println!(
                "  Camera: {}  (set {} to use a real one)",
                "simulated".yellow(),
                "camera_snapshot".bold()
            );
            registry.with_camera("sim_cam").build()
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// First-Run Wizard
// ─────────────────────────────────────────────────────────────────────────────

fn run_first_run_wizard() -> config::Config {
    println!();
    println!("{}", "  ╔══════════════════════════════════════╗".bold().cyan());
    println!("{}", "  ║        Doda First-Run Wizard         ║".bold().cyan());
    println!("{}", "  ╚══════════════════════════════════════╝".bold().cyan());
    println!();
    println!("  No configuration found.  Let's set up Doda.\n");

    let mut cfg = config::Config::default();

    println!("  How long should a game be?");
    println!("    1) Classic  (win at +30, lose at -30)");
    println!("    2) Quick    (win at +15, lose at -10)");
    let choice = prompt_line("  Enter choice [1]: ", "1");
    cfg.thresholds = match choice.trim() {
        "2" => "quick".to_string(),
        _ => "classic".to_string(),
    };

    cfg.llm_url = prompt_line(
        &format!("  Model server URL [{}]: ", cfg.llm_url),
        &cfg.llm_url,
    );
    cfg.model = prompt_line(&format!("  Vision model [{}]: ", cfg.model), &cfg.model);

    let reasoning = prompt_line("  Let the model judge gifts too? [y/N]: ", "n");
    cfg.reasoning = reasoning.eq_ignore_ascii_case("y") || reasoning.eq_ignore_ascii_case("yes");

    let snapshot = prompt_line("  Camera snapshot file (empty for simulated camera): ", "");
    if !snapshot.is_empty() {
        cfg.camera_snapshot = Some(snapshot.into());
    }

    config::apply_env_overrides(&mut cfg);
    match config::save(&cfg) {
        Ok(()) => println!(
            "\n  {} Config saved to {}\n",
            "✓".green().bold(),
            config::config_path().display().to_string().bold()
        ),
        Err(e) => println!("{}: {}", "Error saving config".red(), e),
    }
    cfg
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("{}", r#"    ___          __    "#.bold().cyan());
    println!("{}", r#"   / _ \___  ___/ /__ _"#.bold().cyan());
    println!("{}", r#"  / // / _ \/ _  / _ `/"#.bold().cyan());
    println!("{}", r#" /____/\___/\_,_/\_,_/ "#.bold().cyan());
    println!();
    println!(
        "  {} {}",
        "Doda".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Bring gifts to a picky dodo robot");
    println!();
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn prompt_line(msg: &str, default: &str) -> String {
    use std::io::{BufRead, Write};
    print!("{}", msg);
    std::io::stdout().flush().ok();
    let mut line = String::new();
    match std::io::stdin().lock().read_line(&mut line) {
        Ok(_) => {
            let t = line.trim().to_string();
            if t.is_empty() { default.to_string() } else { t }
        }
        Err(_) => default.to_string(),
    }
}
