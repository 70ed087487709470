//! REPL – the interactive Doda shell.
//!
//! Supported slash-commands:
//!   /help                                   – show this list
//!   /status                                 – gratification level and outcome
//!   /history                                – every gift applied so far
//!   /prefs [category]                       – the preference table
//!   /addpref <category> <keyword> <score> <reason…>
//!   /gift                                   – capture and evaluate a gift
//!   /describe <text>                        – score a typed description
//!   /dodo <size> <color…>                   – score a dodo gift by hand
//!   /behavior <name>                        – play a behavior
//!   /rotate <degrees> [left|right|auto]     – turn the base and come back
//!   /joints                                 – current joint angles
//!   /reset                                  – start a new game
//!   /models                                 – list local models
//!   /quit | /exit                           – leave

use colored::Colorize;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use doda_hal::HardwareRegistry;
use doda_runtime::{GiftLoop, TurnOutcome};
use doda_types::{
    BehaviorKind, EvaluationResult, ObjectAttributes, Outcome, PreferenceCategory, RobotIntent,
    TurnDirection,
};

use crate::config::Config;
use crate::ollama;

/// A parsed REPL line.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Help,
    Status,
    History,
    Prefs(Option<PreferenceCategory>),
    AddPref {
        category: String,
        keyword: String,
        score: i32,
        reason: String,
    },
    Gift,
    Describe(String),
    Dodo { size: String, color: String },
    Behavior(BehaviorKind),
    Rotate { degrees: f32, direction: TurnDirection },
    Joints,
    Reset,
    Models,
    Quit,
}

impl Command {
    /// Parse one input line.  The error is a message for the user.
    pub fn parse(line: &str) -> Result<Command, String> {
        let args = split_args(line);
        let Some((head, rest)) = args.split_first() else {
            return Err("empty command".to_string());
        };

        match head.as_str() {
            "/help" => Ok(Command::Help),
            "/status" => Ok(Command::Status),
            "/history" => Ok(Command::History),
            "/prefs" => match rest.first() {
                None => Ok(Command::Prefs(None)),
                Some(c) => c
                    .parse::<PreferenceCategory>()
                    .map(|c| Command::Prefs(Some(c)))
                    .map_err(|e| e.to_string()),
            },
            "/addpref" => {
                let [category, keyword, score, reason @ ..] = rest else {
                    return Err("usage: /addpref <category> <keyword> <score> <reason…>".to_string());
                };
                let score = score
                    .parse::<i32>()
                    .map_err(|_| format!("'{score}' is not a whole number"))?;
                Ok(Command::AddPref {
                    category: category.clone(),
                    keyword: keyword.clone(),
                    score,
                    reason: reason.join(" "),
                })
            }
            "/gift" => Ok(Command::Gift),
            "/describe" if !rest.is_empty() => Ok(Command::Describe(rest.join(" "))),
            "/describe" => Err("usage: /describe <text>".to_string()),
            "/dodo" => match rest {
                [size, color @ ..] => Ok(Command::Dodo {
                    size: size.clone(),
                    color: color.join(" "),
                }),
                [] => Err("usage: /dodo <size> <color…>".to_string()),
            },
            "/behavior" => match rest.first() {
                Some(name) => name
                    .parse::<BehaviorKind>()
                    .map(Command::Behavior)
                    .map_err(|e| e.to_string()),
                None => Err(format!(
                    "usage: /behavior <{}>",
                    BehaviorKind::ALL.map(BehaviorKind::name).join("|")
                )),
            },
            "/rotate" => {
                let Some(degrees) = rest.first() else {
                    return Err("usage: /rotate <degrees> [left|right|auto]".to_string());
                };
                let degrees = degrees
                    .parse::<f32>()
                    .map_err(|_| format!("'{degrees}' is not a number"))?;
                let direction = match rest.get(1) {
                    Some(d) => d.parse::<TurnDirection>().map_err(|e| e.to_string())?,
                    None => TurnDirection::Auto,
                };
                Ok(Command::Rotate { degrees, direction })
            }
            "/joints" => Ok(Command::Joints),
            "/reset" => Ok(Command::Reset),
            "/models" => Ok(Command::Models),
            "/quit" | "/exit" => Ok(Command::Quit),
            other => Err(format!("Unknown command '{other}'")),
        }
    }
}

/// Split on whitespace, keeping `"double quoted"` runs together.
fn split_args(line: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    for ch in line.trim().chars() {
        match ch {
            '"' => quoted = !quoted,
            c if c.is_whitespace() && !quoted => {
                if !current.is_empty() {
                    args.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        args.push(current);
    }
    args
}

/// Command every actuator to hold still.  Used on Ctrl-C.
pub fn hold_all(hardware: &Mutex<HardwareRegistry>) {
    match hardware.lock() {
        Ok(mut registry) => match registry.dispatch(RobotIntent::HoldPosition) {
            Ok(()) => println!("{}", "  ✓ Actuators holding position.".green()),
            Err(e) => println!("  {} {}", "✗ Hold failed:".red(), e),
        },
        Err(_) => println!("  {}", "✗ Hardware lock poisoned; cannot hold.".red()),
    }
}

/// Everything the REPL needs to run commands.
pub struct Shell {
    pub gift_loop: GiftLoop,
    pub runtime: tokio::runtime::Runtime,
    pub cfg: Config,
    pub shutdown: Arc<AtomicBool>,
}

/// Entry point for the interactive REPL.
///
/// `shell.shutdown` is polled each iteration; when set the REPL exits.
pub fn run(mut shell: Shell) {
    let mut editor = match DefaultEditor::new() {
        Ok(editor) => editor,
        Err(e) => {
            eprintln!("{}: {}", "Terminal error".red(), e);
            return;
        }
    };

    loop {
        if shell.shutdown.load(Ordering::SeqCst) {
            break;
        }

        let line = match editor.readline("doda> ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) => {
                println!("{}", "⚠  Ctrl-C – stopping.".yellow().bold());
                hold_all(&shell.gift_loop.hardware());
                break;
            }
            Err(ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("{}: {}", "Read error".red(), e);
                break;
            }
        };

        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let _ = editor.add_history_entry(line);

        match Command::parse(line) {
            Ok(Command::Quit) => {
                println!("{}", "Goodbye.".green());
                shell.shutdown.store(true, Ordering::SeqCst);
                break;
            }
            Ok(cmd) => shell.execute(cmd),
            Err(msg) => println!(
                "{} {}. Type {} for available commands.",
                "✗".red(),
                msg,
                "/help".bold()
            ),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Command handlers
// ─────────────────────────────────────────────────────────────────────────────

impl Shell {
    fn execute(&mut self, cmd: Command) {
        match cmd {
            Command::Help => cmd_help(),
            Command::Status => self.cmd_status(),
            Command::History => self.cmd_history(),
            Command::Prefs(category) => self.cmd_prefs(category),
            Command::AddPref {
                category,
                keyword,
                score,
                reason,
            } => self.cmd_addpref(&category, &keyword, score, &reason),
            Command::Gift => {
                println!("  {}", "Show me your gift…".dimmed());
                let outcome = self.runtime.block_on(self.gift_loop.present_gift());
                print_turn(&outcome);
            }
            Command::Describe(text) => self.evaluate(ObjectAttributes::generic(text)),
            Command::Dodo { size, color } => {
                self.evaluate(ObjectAttributes::dodo("a dodo bird", size, color))
            }
            Command::Behavior(kind) => {
                let result = self
                    .runtime
                    .block_on(self.gift_loop.dispatch(RobotIntent::PerformBehavior(kind)));
                match result {
                    Ok(()) => println!("  {} {}", "✓".green(), kind.to_string().bold()),
                    Err(e) => println!("  {} {}", "✗".red(), e),
                }
            }
            Command::Rotate { degrees, direction } => {
                match self.runtime.block_on(self.gift_loop.rotate(degrees, direction)) {
                    Ok(turned) => println!("  {} turned {:+.0}° and back", "✓".green(), turned),
                    Err(e) => println!("  {} {}", "✗".red(), e),
                }
            }
            Command::Joints => self.cmd_joints(),
            Command::Reset => {
                self.gift_loop.session_mut().reset_game();
                println!("  {} New game.  Gratification is back to 0.", "✓".green());
            }
            Command::Models => self.cmd_models(),
            Command::Quit => {}
        }
        if let Some(e) = self.gift_loop.session().last_persist_error() {
            println!("  {} {}", "⚠ Not saved:".yellow(), e.dimmed());
        }
    }

    fn evaluate(&mut self, gift: ObjectAttributes) {
        let outcome = self.runtime.block_on(self.gift_loop.evaluate_gift(gift, None));
        print_turn(&outcome);
    }

    fn cmd_status(&self) {
        let s = self.gift_loop.session().status();
        println!("{}", "Doda".bold().underline());
        println!(
            "  Gratification : {}  (lose at {}, win at {})",
            colored_level(s.level),
            s.lose_threshold,
            s.win_threshold
        );
        println!("  Gifts         : {}", s.gift_count);
        println!("  Game          : {}", outcome_label(s.outcome));
        println!("  Scorer        : {}", self.gift_loop.session().scorer_name());
    }

    fn cmd_history(&self) {
        let history = self.gift_loop.session().history();
        if history.is_empty() {
            println!("  {}", "No gifts yet.".dimmed());
            return;
        }
        println!("{}", "Gift History".bold().underline());
        for (i, g) in history.iter().enumerate() {
            let when = chrono::DateTime::parse_from_rfc3339(&g.timestamp)
                .map(|t| t.with_timezone(&chrono::Local).format("%H:%M:%S").to_string())
                .unwrap_or_else(|_| g.timestamp.clone());
            let dodo = if g.is_special_class { " 🦤" } else { "" };
            println!(
                "  {:>3}. {}  {:>4}  → {:>4}  {}{}",
                i + 1,
                when.dimmed(),
                signed(g.score_delta),
                g.score_after,
                g.description,
                dodo
            );
        }
    }

    fn cmd_prefs(&self, only: Option<PreferenceCategory>) {
        let table = self.gift_loop.session().preferences();
        for category in PreferenceCategory::ALL {
            if only.is_some_and(|c| c != category) {
                continue;
            }
            println!("{}", category.file_key().bold().underline());
            let entries = table.category(category);
            if entries.is_empty() {
                println!("  {}", "(none)".dimmed());
            }
            for e in entries {
                println!("  {:>4}  {}  {}", signed(e.score), e.keyword.bold(), e.reason.dimmed());
            }
        }
    }

    fn cmd_addpref(&mut self, category: &str, keyword: &str, score: i32, reason: &str) {
        match self
            .gift_loop
            .session_mut()
            .add_preference(category, keyword, score, reason)
        {
            Ok(()) => println!(
                "  {} Doda now {} '{}' ({})",
                "✓".green(),
                category.to_lowercase(),
                keyword.bold(),
                signed(score)
            ),
            Err(e) => println!("  {} {}", "✗".red(), e),
        }
    }

    fn cmd_joints(&self) {
        match self.gift_loop.joint_positions() {
            Ok(joints) if joints.is_empty() => println!("  {}", "No actuators registered.".dimmed()),
            Ok(joints) => {
                for (name, deg) in joints {
                    println!("  {:<14} {:>7.1}°", name, deg);
                }
            }
            Err(e) => println!("  {} {}", "✗".red(), e),
        }
    }

    fn cmd_models(&self) {
        println!("{}", "Models".bold().underline());
        println!("  Active model : {}", self.cfg.model.yellow());
        println!("  Endpoint     : {}", self.cfg.llm_url.dimmed());
        match ollama::fetch_models(&self.cfg.llm_url) {
            Ok(models) if models.is_empty() => {
                println!("  {}", "no models found".yellow());
                println!("  Run `ollama pull {}` to download one.", self.cfg.model);
            }
            Ok(models) => {
                for m in &models {
                    let marker = if m.answers_to(&self.cfg.model) { "▶" } else { " " };
                    let gb = m.size as f64 / 1e9;
                    println!("    {} {} {}", marker.green(), m.name.bold(), format!("{gb:.1} GB").dimmed());
                }
                if !models.iter().any(|m| m.answers_to(&self.cfg.model)) {
                    println!(
                        "  {} '{}' is not installed; /gift will fail.",
                        "⚠".yellow(),
                        self.cfg.model
                    );
                }
            }
            Err(e) => {
                println!("  {}", "offline".red());
                println!("  {}", e.dimmed());
            }
        }
    }
}

fn cmd_help() {
    println!();
    println!("{}", "Doda Commands".bold().underline());
    let rows = [
        ("/status", "gratification level and game state"),
        ("/history", "gifts applied so far"),
        ("/prefs [category]", "what Doda loves, likes, dislikes and hates"),
        ("/addpref <cat> <kw> <score> <reason…>", "teach Doda a new preference"),
        ("/gift", "capture a gift with the camera and evaluate it"),
        ("/describe <text>", "evaluate a gift from a description"),
        ("/dodo <size> <color…>", "evaluate a dodo gift"),
        ("/behavior <name>", "play a behavior"),
        ("/rotate <deg> [left|right|auto]", "turn the base and come back"),
        ("/joints", "current joint angles"),
        ("/reset", "start a new game"),
        ("/models", "list local models"),
        ("/quit  /exit", "leave"),
    ];
    for (cmd, what) in rows {
        println!("  {:<40} – {}", cmd.bold().cyan(), what);
    }
    println!();
}

// ─────────────────────────────────────────────────────────────────────────────
// Output helpers
// ─────────────────────────────────────────────────────────────────────────────

fn print_turn(outcome: &TurnOutcome) {
    match outcome {
        TurnOutcome::Scored {
            gift,
            result,
            scorer,
            reaction,
        } => {
            println!("  {} {}", "Gift:".bold(), gift.description);
            print_result(result);
            let reaction = reaction.map(|r| format!(", reacts with {r}")).unwrap_or_default();
            println!("  {}", format!("(scored by {scorer}{reaction})").dimmed());
        }
        TurnOutcome::Unavailable { reason } => {
            println!("  {} {}", "✗ Could not evaluate the gift:".red(), reason);
            println!("  {}", "No score was applied.".dimmed());
        }
        TurnOutcome::SessionOver(outcome) => {
            println!(
                "  Game already {}.  Type {} to play again.",
                outcome_label(*outcome),
                "/reset".bold()
            );
        }
    }
}

fn print_result(r: &EvaluationResult) {
    println!("  {} \"{}\"", "Doda:".bold(), r.reason.italic());
    println!(
        "  Affinity {}  →  gratification {}",
        signed(r.score).bold(),
        colored_level(r.new_level)
    );
    match r.outcome {
        Outcome::Won => println!("  {}", "🎉 Doda is delighted!  You won!".green().bold()),
        Outcome::Lost => println!("  {}", "💔 Doda has had enough.  You lost.".red().bold()),
        Outcome::None => {}
    }
}

fn signed(n: i32) -> String {
    format!("{n:+}")
}

fn colored_level(level: i32) -> colored::ColoredString {
    let text = level.to_string();
    match level {
        l if l > 0 => text.green(),
        l if l < 0 => text.red(),
        _ => text.normal(),
    }
}

fn outcome_label(outcome: Outcome) -> colored::ColoredString {
    match outcome {
        Outcome::Won => "won".green().bold(),
        Outcome::Lost => "lost".red().bold(),
        Outcome::None => "in progress".normal(),
    }
}
