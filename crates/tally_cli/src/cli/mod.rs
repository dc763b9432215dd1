use clap::{Parser, Subcommand};
use tally_core::config::{ConfigOverrides, ScoringField};
use tally_core::leaderboard::DEFAULT_LIMIT;

#[derive(Parser, Debug)]
#[command(name = "tally", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Output JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Act as this user (falls back to TALLY_USER, then default_user in config)
    #[arg(long, value_name = "ID", global = true)]
    pub user: Option<String>,

    /// Evaluate the command at this RFC3339 instant instead of now
    #[arg(long, value_name = "RFC3339", global = true)]
    pub at: Option<String>,

    /// Override configuration values (format KEY=VALUE)
    #[arg(long = "config-override", value_name = "KEY=VALUE", global = true)]
    pub config_override: Vec<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Manage users
    User {
        #[command(subcommand)]
        user: UserCommand,
    },
    /// Add a new task
    ///
    /// Example: tally add "Write report" --deadline 2025-12-20T17:00:00Z
    Add {
        title: Option<String>,
        /// Deadline (defaults to the end of today)
        #[arg(long, value_name = "RFC3339")]
        deadline: Option<String>,
    },
    /// List your tasks, newest first
    List,
    /// Mark a task as completed
    ///
    /// Example: tally done task-1
    Done { id: String },
    /// Un-complete a task (allowed once per task)
    ///
    /// Example: tally undo task-1
    Undo { id: String },
    /// Delete a task
    Delete { id: String },
    /// Fail overdue tasks and apply the penalty
    Sweep,
    /// Show the top users by score
    Leaderboard {
        #[arg(long, default_value_t = DEFAULT_LIMIT)]
        limit: usize,
    },
    /// Show the rank for a score
    ///
    /// Example: tally rank 120
    Rank {
        #[arg(allow_negative_numbers = true)]
        score: i64,
    },
}

#[derive(Subcommand, Debug)]
pub enum UserCommand {
    /// Register a user
    ///
    /// Example: tally user add "Ada" --guest
    Add {
        name: String,
        #[arg(long)]
        guest: bool,
    },
    /// Show a user's score and rank
    Show { id: Option<String> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigOverrideTarget {
    Theme,
    DefaultUser,
    Scoring(ScoringField),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedConfigOverride {
    pub target: ConfigOverrideTarget,
    pub value: String,
}

/// Parse a raw `KEY=VALUE` override string into a structured target.
pub fn parse_config_override(raw: &str) -> Result<ParsedConfigOverride, String> {
    let trimmed = raw.trim();
    let (key_raw, value_raw) = trimmed
        .split_once('=')
        .ok_or_else(|| "override must be in KEY=VALUE format".to_string())?;

    let value = value_raw.trim().to_string();
    let (field, remainder) = key_raw
        .split_once('.')
        .map(|(field, rest)| (field.trim(), Some(rest.trim())))
        .unwrap_or((key_raw.trim(), None));

    let canonical_field =
        canonicalize_flag_name(field).ok_or_else(|| "override key cannot be empty".to_string())?;

    match canonical_field.as_str() {
        "theme" | "default_user" => {
            if remainder.is_some() {
                return Err(format!("{canonical_field} override cannot have subfields"));
            }
            let target = if canonical_field == "theme" {
                ConfigOverrideTarget::Theme
            } else {
                ConfigOverrideTarget::DefaultUser
            };
            Ok(ParsedConfigOverride { target, value })
        }
        "scoring" => {
            let rule = remainder
                .and_then(canonicalize_flag_name)
                .ok_or_else(|| "scoring override requires a rule name".to_string())?;
            let field = ScoringField::parse(&rule)
                .ok_or_else(|| format!("unknown scoring rule '{rule}'"))?;
            Ok(ParsedConfigOverride {
                target: ConfigOverrideTarget::Scoring(field),
                value,
            })
        }
        other => Err(format!("unknown config field '{other}'")),
    }
}

pub fn collect_overrides(raw: &[String]) -> Result<ConfigOverrides, String> {
    let mut overrides = ConfigOverrides::default();
    for entry in raw {
        let parsed = parse_config_override(entry)?;
        match parsed.target {
            ConfigOverrideTarget::Theme => overrides.theme = Some(parsed.value),
            ConfigOverrideTarget::DefaultUser => overrides.default_user = Some(parsed.value),
            ConfigOverrideTarget::Scoring(field) => overrides.scoring.push((field, parsed.value)),
        }
    }
    Ok(overrides)
}

fn canonicalize_flag_name(name: &str) -> Option<String> {
    let mut cleaned = String::new();
    let mut previous_underscore = false;

    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            cleaned.push(ch.to_ascii_lowercase());
            previous_underscore = false;
        } else if !previous_underscore && !cleaned.is_empty() {
            cleaned.push('_');
            previous_underscore = true;
        }
    }

    let trimmed = cleaned.trim_matches('_');
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
