use clap::Parser;
use clap::error::ErrorKind;
use tabled::settings::Style;
use tabled::{Table, Tabled};
use tally_cli::cli::{Cli, Command, UserCommand, collect_overrides};
use tally_core::config::{Palette, load_config_with_fallback, merge_overrides, palette_for_theme};
use tally_core::error::AppError;
use tally_core::leaderboard::LeaderboardEntry;
use tally_core::model::{Task, User};
use tally_core::notify::notifier_from_env;
use tally_core::rank::Rank;
use tally_core::storage::JsonStore;
use tally_core::task_api::now_local;
use tally_core::{Tally, ToggleOutcome};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

const USER_ENV_VAR: &str = "TALLY_USER";
const LOG_ENV_VAR: &str = "TALLY_LOG";

struct Context {
    tally: Tally<JsonStore>,
    palette: Palette,
    default_user: Option<String>,
    now: OffsetDateTime,
    json: bool,
}

impl Context {
    fn acting_user(&self, explicit: Option<&str>) -> Result<String, AppError> {
        explicit
            .map(str::to_string)
            .or_else(|| std::env::var(USER_ENV_VAR).ok())
            .or_else(|| self.default_user.clone())
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                AppError::invalid_input("user is required (use --user or TALLY_USER)")
            })
    }

    fn rank_label(&self, rank: &Rank) -> String {
        self.palette.colorize(rank.color, rank.name)
    }
}

#[derive(Tabled)]
struct LeaderboardRow {
    #[tabled(rename = "#")]
    position: usize,
    name: String,
    score: i64,
    rank: &'static str,
    completed: usize,
    failed: usize,
}

impl From<&LeaderboardEntry> for LeaderboardRow {
    fn from(entry: &LeaderboardEntry) -> Self {
        Self {
            position: entry.position,
            name: entry.name.clone(),
            score: entry.score,
            rank: entry.rank.name,
            completed: entry.tasks_completed,
            failed: entry.tasks_failed,
        }
    }
}

fn task_json(task: &Task) -> serde_json::Value {
    serde_json::json!({
        "id": task.id,
        "title": task.title,
        "status": task.status_label(),
        "created_at": task.created_at,
        "deadline": task.deadline,
        "points": task.points,
        "points_awarded": task.points_awarded,
        "amended_once": task.amended_once,
        "completed_at": task.completed_at,
    })
}

fn user_json(user: &User, rank: &Rank) -> serde_json::Value {
    serde_json::json!({
        "id": user.id,
        "name": user.name,
        "is_guest": user.is_guest,
        "score": user.score,
        "rank": rank,
    })
}

fn print_tasks_plain(ctx: &Context, tasks: &[Task]) {
    for task in tasks {
        println!(
            "{} | {} | {} | {} | {}",
            task.id,
            task.title,
            task.status_label(),
            ctx.palette.mutedize(&task.deadline),
            task.points
        );
    }
}

fn print_toggle(ctx: &Context, verb: &str, outcome: &ToggleOutcome) {
    if ctx.json {
        println!(
            "{}",
            serde_json::json!({
                "task": task_json(&outcome.task),
                "points_delta": outcome.points_delta,
                "score": outcome.user_score,
                "rank": outcome.rank,
            })
        );
    } else {
        println!(
            "{} task: {} ({}) {:+} points, score {} [{}]",
            verb,
            outcome.task.title,
            outcome.task.id,
            outcome.points_delta,
            outcome.user_score,
            ctx.rank_label(outcome.rank)
        );
    }
}

fn normalize_parse_error(err: clap::Error) -> AppError {
    let rendered = err.to_string();
    let first_line = rendered.lines().next().unwrap_or("invalid command").trim();
    let message = first_line
        .strip_prefix("error: ")
        .unwrap_or(first_line)
        .to_string();
    AppError::invalid_input(message)
}

fn parse_now(at: Option<&str>) -> Result<OffsetDateTime, AppError> {
    match at {
        Some(value) => OffsetDateTime::parse(value.trim(), &Rfc3339)
            .map_err(|_| AppError::invalid_input("--at must be RFC3339")),
        None => Ok(now_local()),
    }
}

fn build_context(cli: &Cli) -> Result<Context, AppError> {
    let loaded = load_config_with_fallback();
    if let Some(err) = &loaded.error {
        warn!(error = %err, "using default config");
    }
    let overrides = collect_overrides(&cli.config_override).map_err(AppError::invalid_input)?;
    let config = merge_overrides(&loaded.config, &overrides)?;

    let store = JsonStore::from_env()?;
    let now = parse_now(cli.at.as_deref())?;
    debug!(store = %store.path().display(), %now, "opening store");

    Ok(Context {
        tally: Tally::new(store, config.scoring, notifier_from_env()),
        palette: palette_for_theme(config.theme.as_deref()),
        default_user: config.default_user,
        now,
        json: cli.json,
    })
}

fn run_command(cli: Cli) -> Result<(), AppError> {
    let ctx = build_context(&cli)?;
    let explicit_user = cli.user.as_deref();

    match cli.command {
        Command::User { user } => match user {
            UserCommand::Add { name, guest } => {
                let user = ctx.tally.register_user(&name, guest, ctx.now)?;
                let rank = ctx.tally.rank(user.score);
                if ctx.json {
                    println!("{}", user_json(&user, rank));
                } else {
                    println!("Registered user: {} ({})", user.name, user.id);
                }
            }
            UserCommand::Show { id } => {
                let user_id = ctx.acting_user(id.as_deref().or(explicit_user))?;
                let user = ctx.tally.get_user(&user_id)?;
                let rank = ctx.tally.rank(user.score);
                if ctx.json {
                    println!("{}", user_json(&user, rank));
                } else {
                    println!(
                        "{} ({}) | score {} | {}",
                        user.name,
                        user.id,
                        user.score,
                        ctx.rank_label(rank)
                    );
                }
            }
        },
        Command::Add { title, deadline } => {
            let title = match title {
                Some(value) if !value.trim().is_empty() => value,
                _ => return Err(AppError::invalid_input("title is required")),
            };
            let user_id = ctx.acting_user(explicit_user)?;
            let task = ctx
                .tally
                .add_task(&user_id, &title, deadline.as_deref(), ctx.now)?;
            if ctx.json {
                println!("{}", task_json(&task));
            } else {
                println!("Added task: {} ({}) due {}", task.title, task.id, task.deadline);
            }
        }
        Command::List => {
            let user_id = ctx.acting_user(explicit_user)?;
            let tasks = ctx.tally.list_tasks(&user_id)?;
            if ctx.json {
                let payload: Vec<_> = tasks.iter().map(task_json).collect();
                println!("{}", serde_json::Value::Array(payload));
            } else {
                print_tasks_plain(&ctx, &tasks);
            }
        }
        Command::Done { id } => {
            let user_id = ctx.acting_user(explicit_user)?;
            let outcome = ctx.tally.toggle_task(&user_id, &id, true, ctx.now)?;
            print_toggle(&ctx, "Completed", &outcome);
        }
        Command::Undo { id } => {
            let user_id = ctx.acting_user(explicit_user)?;
            let outcome = ctx.tally.toggle_task(&user_id, &id, false, ctx.now)?;
            print_toggle(&ctx, "Reopened", &outcome);
        }
        Command::Delete { id } => {
            let user_id = ctx.acting_user(explicit_user)?;
            let task = ctx.tally.delete_task(&user_id, &id)?;
            if ctx.json {
                println!("{}", task_json(&task));
            } else {
                println!("Deleted task: {} ({})", task.title, task.id);
            }
        }
        Command::Sweep => {
            let report = ctx.tally.sweep_deadlines(ctx.now)?;
            if ctx.json {
                println!(
                    "{}",
                    serde_json::json!({
                        "processed": report.processed,
                        "failed_task_ids": report.failed_task_ids,
                    })
                );
            } else {
                println!("Failed {} overdue task(s)", report.processed);
            }
        }
        Command::Leaderboard { limit } => {
            let entries = ctx.tally.leaderboard(limit)?;
            if ctx.json {
                let payload = serde_json::to_value(&entries)
                    .map_err(|err| AppError::invalid_data(err.to_string()))?;
                println!("{payload}");
            } else if entries.is_empty() {
                println!("No ranked users yet");
            } else {
                let mut table = Table::new(entries.iter().map(LeaderboardRow::from));
                table.with(Style::psql());
                println!("{table}");
            }
        }
        Command::Rank { score } => {
            let rank = ctx.tally.rank(score);
            if ctx.json {
                println!("{}", serde_json::json!(rank));
            } else {
                println!("{} (from {})", ctx.rank_label(rank), rank.min_score);
            }
        }
    }

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    init_tracing();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            err.exit()
        }
        Err(err) => {
            eprintln!("ERROR: {}", normalize_parse_error(err));
            std::process::exit(1);
        }
    };

    if let Err(err) = run_command(cli) {
        eprintln!("ERROR: {}", err);
        std::process::exit(1);
    }
}
