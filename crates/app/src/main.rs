use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use services::progress::{DEFAULT_AUTO_ADVANCE_DELAY, DEFAULT_FLUSH_DELAY, DEFAULT_STORAGE_KEY};
use services::{AppServices, Clock, DeviceInfo, ExportMeta, ProgressStore, StoreSettings};
use study_core::model::DayStep;
use study_core::plan::DEFAULT_PLAN_DAYS;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

mod render;

const BUILTIN_CATALOG: &str = include_str!("../content/chemistry.json");

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    MissingOperand { command: &'static str, operand: &'static str },
    UnknownArg(String),
    UnknownCommand(String),
    InvalidNumber { what: &'static str, raw: String },
    InvalidToggle { raw: String },
    InvalidStep { raw: String },
    InvalidDbUrl { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingOperand { command, operand } => {
                write!(f, "{command} requires <{operand}>")
            }
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::UnknownCommand(cmd) => write!(f, "unknown subcommand: {cmd}"),
            ArgsError::InvalidNumber { what, raw } => write!(f, "invalid {what}: {raw}"),
            ArgsError::InvalidToggle { raw } => write!(f, "expected on|off, got: {raw}"),
            ArgsError::InvalidStep { raw } => write!(f, "expected concept|practice, got: {raw}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- [--db <sqlite_url>] [--catalog <file>] [--days <n>] <command>");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  status                          mastery, plan and storage health (default)");
    eprintln!("  questions                       list diagnostic questions");
    eprintln!("  answer <question-id> <choice>   choices are numbered from 1; with auto-next on,");
    eprintln!("                                  the last answer also submits the diagnostic");
    eprintln!("  clear <question-id>");
    eprintln!("  submit                          build the plan from a complete diagnostic");
    eprintln!("  regenerate                      rebuild the plan from current answers");
    eprintln!("  practice [<day>]                practice questions for a day");
    eprintln!("  day <day>                       move to a study day");
    eprintln!("  toggle <day> <concept|practice>");
    eprintln!("  reveal <question-id> [--hide]");
    eprintln!("  reveal-day [--hide]             every practice answer of the current day");
    eprintln!("  settings [--auto-next on|off] [--shuffle on|off]");
    eprintln!("  export [--out <file>]");
    eprintln!("  import <file|-> [--yes]");
    eprintln!("  reset-diagnostic");
    eprintln!("  reset");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  STUDY_DB_URL, STUDY_CATALOG, STUDY_PLAN_DAYS, STUDY_FLUSH_DELAY_MS, RUST_LOG");
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Status,
    Questions,
    Answer { question: String, choice: usize },
    Clear { question: String },
    Submit,
    Regenerate,
    Practice { day: Option<usize> },
    Day { day: usize },
    Toggle { day: usize, step: DayStep },
    Reveal { question: String, show: bool },
    RevealDay { show: bool },
    Settings {
        auto_next: Option<bool>,
        shuffle: Option<bool>,
    },
    Export { out: Option<PathBuf> },
    Import { source: String, confirmed: bool },
    ResetDiagnostic,
    Reset,
}

struct Args {
    db_url: String,
    catalog: Option<PathBuf>,
    plan_days: usize,
    flush_delay: Duration,
    command: Command,
}

impl Args {
    fn parse(mut args: impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut db_url = std::env::var("STUDY_DB_URL")
            .ok()
            .map_or_else(|| "sqlite://study.sqlite3".into(), normalize_sqlite_url);
        let mut catalog = std::env::var("STUDY_CATALOG").ok().map(PathBuf::from);
        let mut plan_days = match std::env::var("STUDY_PLAN_DAYS") {
            Ok(raw) => parse_count("STUDY_PLAN_DAYS", raw)?,
            Err(_) => DEFAULT_PLAN_DAYS,
        };
        let flush_delay = match std::env::var("STUDY_FLUSH_DELAY_MS") {
            Ok(raw) => Duration::from_millis(parse_count("STUDY_FLUSH_DELAY_MS", raw)? as u64),
            Err(_) => DEFAULT_FLUSH_DELAY,
        };

        let mut positional = Vec::new();
        let mut show = true;
        let mut confirmed = false;
        let mut out = None;
        let mut auto_next = None;
        let mut shuffle = None;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = normalize_sqlite_url(value);
                }
                "--catalog" => catalog = Some(require_value(&mut args, "--catalog")?.into()),
                "--days" => plan_days = parse_count("--days", require_value(&mut args, "--days")?)?,
                "--out" => out = Some(require_value(&mut args, "--out")?.into()),
                "--auto-next" => auto_next = Some(parse_toggle(require_value(&mut args, "--auto-next")?)?),
                "--shuffle" => shuffle = Some(parse_toggle(require_value(&mut args, "--shuffle")?)?),
                "--hide" => show = false,
                "--yes" | "-y" => confirmed = true,
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                "-" => positional.push(arg),
                _ if arg.starts_with('-') => return Err(ArgsError::UnknownArg(arg)),
                _ => positional.push(arg),
            }
        }

        let mut positional = positional.into_iter();
        let command = match positional.next().as_deref() {
            None | Some("status") => Command::Status,
            Some("questions") => Command::Questions,
            Some("answer") => {
                let question = operand(&mut positional, "answer", "question-id")?;
                let choice = parse_ordinal("choice", operand(&mut positional, "answer", "choice")?)?;
                Command::Answer { question, choice }
            }
            Some("clear") => Command::Clear {
                question: operand(&mut positional, "clear", "question-id")?,
            },
            Some("submit") => Command::Submit,
            Some("regenerate") => Command::Regenerate,
            Some("practice") => Command::Practice {
                day: positional
                    .next()
                    .map(|raw| parse_ordinal("day", raw))
                    .transpose()?,
            },
            Some("day") => Command::Day {
                day: parse_ordinal("day", operand(&mut positional, "day", "day")?)?,
            },
            Some("toggle") => {
                let day = parse_ordinal("day", operand(&mut positional, "toggle", "day")?)?;
                let raw = operand(&mut positional, "toggle", "step")?;
                let step = DayStep::parse(&raw).ok_or(ArgsError::InvalidStep { raw })?;
                Command::Toggle { day, step }
            }
            Some("reveal") => Command::Reveal {
                question: operand(&mut positional, "reveal", "question-id")?,
                show,
            },
            Some("reveal-day") => Command::RevealDay { show },
            Some("settings") => Command::Settings { auto_next, shuffle },
            Some("export") => Command::Export { out },
            Some("import") => Command::Import {
                source: operand(&mut positional, "import", "file")?,
                confirmed,
            },
            Some("reset-diagnostic") => Command::ResetDiagnostic,
            Some("reset") => Command::Reset,
            Some(other) => return Err(ArgsError::UnknownCommand(other.to_owned())),
        };
        if let Some(extra) = positional.next() {
            return Err(ArgsError::UnknownArg(extra));
        }

        Ok(Self {
            db_url,
            catalog,
            plan_days,
            flush_delay,
            command,
        })
    }
}

fn operand(
    args: &mut impl Iterator<Item = String>,
    command: &'static str,
    operand: &'static str,
) -> Result<String, ArgsError> {
    args.next()
        .ok_or(ArgsError::MissingOperand { command, operand })
}

fn parse_count(what: &'static str, raw: String) -> Result<usize, ArgsError> {
    raw.trim()
        .parse()
        .map_err(|_| ArgsError::InvalidNumber { what, raw })
}

/// 1-based on the command line, 0-based inside.
fn parse_ordinal(what: &'static str, raw: String) -> Result<usize, ArgsError> {
    match raw.trim().parse::<usize>() {
        Ok(n) if n > 0 => Ok(n - 1),
        _ => Err(ArgsError::InvalidNumber { what, raw }),
    }
}

fn parse_toggle(raw: String) -> Result<bool, ArgsError> {
    match raw.as_str() {
        "on" | "true" | "yes" => Ok(true),
        "off" | "false" | "no" => Ok(false),
        _ => Err(ArgsError::InvalidToggle { raw }),
    }
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
        return raw;
    }

    let trimmed = raw.trim().to_string();
    let path_str = trimmed
        .strip_prefix("sqlite:")
        .unwrap_or(trimmed.as_str())
        .to_string();
    let path = std::path::Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| std::path::PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    let path = std::path::Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }
    Ok(())
}

fn export_meta() -> ExportMeta {
    ExportMeta {
        app_version: Some(env!("CARGO_PKG_VERSION").to_owned()),
        build_time: option_env!("STUDY_BUILD_TIME").map(str::to_owned),
        device: Some(DeviceInfo {
            user_agent: Some(format!(
                "study-cli/{} ({}; {})",
                env!("CARGO_PKG_VERSION"),
                std::env::consts::OS,
                std::env::consts::ARCH
            )),
            language: std::env::var("LANG").ok(),
            standalone: Some(true),
            online: None,
        }),
    }
}

fn read_import_source(source: &str) -> std::io::Result<String> {
    if source == "-" {
        std::io::read_to_string(std::io::stdin())
    } else {
        std::fs::read_to_string(source)
    }
}

async fn execute(
    store: &mut ProgressStore,
    command: Command,
) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Command::Status => render::status(store),
        Command::Questions => render::questions(store),
        Command::Answer { question, choice } => {
            store.record_answer(&question, choice)?;
            if store.pending_auto_action().is_some() {
                // One-shot process: wait out the auto-next delay here.
                tokio::time::sleep(store.settings().auto_advance_delay()).await;
                let report = store.tick().await;
                match report.submitted {
                    Some(Ok(())) => {
                        render::plan(store);
                        return Ok(());
                    }
                    Some(Err(err)) => println!("not submitted: {err}"),
                    None => {}
                }
            }
            render::diagnostic_progress(store);
        }
        Command::Clear { question } => {
            if !store.clear_answer(&question) {
                println!("{question} was not answered");
            }
        }
        Command::Submit => {
            store.submit_diagnostic()?;
            render::plan(store);
        }
        Command::Regenerate => {
            store.regenerate_plan()?;
            render::plan(store);
        }
        Command::Practice { day } => {
            let day = day.unwrap_or(store.day_index());
            render::practice(store, day)?;
        }
        Command::Day { day } => {
            store.set_day(day)?;
            render::plan(store);
        }
        Command::Toggle { day, step } => {
            let done = store.toggle_day_step(day, step)?;
            let state = if done { "done" } else { "not done" };
            println!("day {}: {} marked {state}", day + 1, step.as_str());
        }
        Command::Reveal { question, show } => store.set_revealed(&question, show)?,
        Command::RevealDay { show } => {
            let count = store.set_all_revealed_for_current_day(show)?;
            let verb = if show { "revealed" } else { "hid" };
            println!("{verb} {count} practice answer(s)");
        }
        Command::Settings { auto_next, shuffle } => {
            if let Some(enabled) = auto_next {
                store.set_auto_next(enabled);
            }
            if let Some(enabled) = shuffle {
                store.set_shuffle_practice(enabled);
            }
            render::settings(store);
        }
        Command::Export { out } => {
            let json = store.export_snapshot(&export_meta()).to_json_pretty()?;
            match out {
                Some(path) => {
                    std::fs::write(&path, json)?;
                    info!(path = %path.display(), "exported progress");
                }
                None => println!("{json}"),
            }
        }
        Command::Import { source, confirmed } => {
            let raw = read_import_source(&source)?;
            let preview = store.preview_import(&raw)?;
            let import = match preview.accept() {
                Ok(import) => import,
                Err(preview) => {
                    for warning in preview.warnings() {
                        eprintln!("warning: {warning}");
                    }
                    if !confirmed {
                        eprintln!("nothing imported; re-run with --yes to continue anyway");
                        return Ok(());
                    }
                    preview.confirm()
                }
            };
            if !store.commit_import(import).await {
                warn!("imported progress is active but could not be saved");
            }
            render::status(store);
        }
        Command::ResetDiagnostic => {
            store.reset_diagnostic();
            println!("diagnostic answers and plan cleared");
        }
        Command::Reset => {
            store.reset_all().await;
            println!("all progress cleared");
        }
    }
    Ok(())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse(std::env::args().skip(1)).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let catalog_json = match &args.catalog {
        Some(path) => std::fs::read_to_string(path)?,
        None => BUILTIN_CATALOG.to_owned(),
    };
    let settings = StoreSettings::new(
        DEFAULT_STORAGE_KEY,
        args.plan_days,
        args.flush_delay,
        DEFAULT_AUTO_ADVANCE_DELAY,
    )?;

    // Open + migrate SQLite at startup. Keep this in the binary glue so core/services stay pure.
    prepare_sqlite_file(&args.db_url)?;
    let services =
        AppServices::new_sqlite(&args.db_url, &catalog_json, settings, Clock::system()).await?;

    let shared = services.store();
    let mut store = shared.lock().await;
    let result = execute(&mut store, args.command).await;

    // A one-shot process is always about to be torn down.
    if store.flush_now().await == Some(false) || store.storage_status().is_unavailable() {
        eprintln!("warning: storage is unavailable; changes will be lost when this process exits");
    }
    result
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Args, ArgsError> {
        Args::parse(args.iter().map(|s| (*s).to_owned()))
    }

    #[test]
    fn defaults_to_status() {
        let args = parse(&[]).unwrap();
        assert_eq!(args.command, Command::Status);
    }

    #[test]
    fn ordinals_are_one_based() {
        let args = parse(&["answer", "mole-d1", "2"]).unwrap();
        assert_eq!(
            args.command,
            Command::Answer {
                question: "mole-d1".into(),
                choice: 1
            }
        );
        assert!(matches!(
            parse(&["day", "0"]),
            Err(ArgsError::InvalidNumber { what: "day", .. })
        ));
    }

    #[test]
    fn flags_may_follow_the_command() {
        let args = parse(&["toggle", "3", "practice", "--days", "5"]).unwrap();
        assert_eq!(args.plan_days, 5);
        assert_eq!(
            args.command,
            Command::Toggle {
                day: 2,
                step: DayStep::Practice
            }
        );

        let args = parse(&["import", "-", "--yes"]).unwrap();
        assert_eq!(
            args.command,
            Command::Import {
                source: "-".into(),
                confirmed: true
            }
        );
    }

    #[test]
    fn settings_toggles_parse() {
        let args = parse(&["settings", "--auto-next", "on", "--shuffle", "off"]).unwrap();
        assert_eq!(
            args.command,
            Command::Settings {
                auto_next: Some(true),
                shuffle: Some(false)
            }
        );
        assert!(matches!(
            parse(&["settings", "--shuffle", "maybe"]),
            Err(ArgsError::InvalidToggle { .. })
        ));
    }

    #[test]
    fn rejects_unknown_input() {
        assert!(matches!(
            parse(&["dance"]),
            Err(ArgsError::UnknownCommand(_))
        ));
        assert!(matches!(parse(&["--nope"]), Err(ArgsError::UnknownArg(_))));
        assert!(matches!(
            parse(&["answer", "mole-d1"]),
            Err(ArgsError::MissingOperand { .. })
        ));
        assert!(matches!(parse(&["--db"]), Err(ArgsError::MissingValue { .. })));
    }

    #[test]
    fn normalizes_relative_sqlite_paths() {
        assert_eq!(normalize_sqlite_url("sqlite::memory:".into()), "sqlite::memory:");
        assert_eq!(
            normalize_sqlite_url("sqlite:///tmp/study.db".into()),
            "sqlite:///tmp/study.db"
        );
        let normalized = normalize_sqlite_url("data/study.db".into());
        assert!(normalized.starts_with("sqlite://"));
        assert!(normalized.ends_with("data/study.db"));
    }

    #[test]
    fn builtin_catalog_is_valid() {
        let catalog = study_core::model::Catalog::from_json(BUILTIN_CATALOG).unwrap();
        assert_eq!(catalog.topics().len(), 3);
        assert_eq!(catalog.diagnostic_len(), 8);
    }
}
