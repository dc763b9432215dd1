use crate::error::AppError;
use crate::scoring::ScoringRules;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const CONFIG_FILE_NAME: &str = "config.json";
const CONFIG_ENV_VAR: &str = "TALLY_CONFIG_PATH";

#[derive(Debug, Clone)]
pub struct Palette {
    enabled: bool,
    muted: &'static str,
    reset: &'static str,
}

impl Palette {
    /// Colors `text` with the rank color name (`gray`, `blue`, ...).
    pub fn colorize(&self, color: &str, text: &str) -> String {
        if !self.enabled {
            return text.to_string();
        }
        match ansi_for_color(color) {
            Some(code) => format!("{}{}{}", code, text, self.reset),
            None => text.to_string(),
        }
    }

    pub fn mutedize(&self, text: &str) -> String {
        if self.muted.is_empty() {
            text.to_string()
        } else {
            format!("{}{}{}", self.muted, text, self.reset)
        }
    }
}

fn ansi_for_color(color: &str) -> Option<&'static str> {
    match color {
        "gray" => Some("\x1b[38;5;245m"),
        "blue" => Some("\x1b[38;5;33m"),
        "green" => Some("\x1b[38;5;35m"),
        "purple" => Some("\x1b[38;5;135m"),
        "yellow" => Some("\x1b[38;5;220m"),
        _ => None,
    }
}

pub fn palette_for_theme(theme: Option<&str>) -> Palette {
    match theme.and_then(canonical_theme_name).as_deref() {
        Some("noir") => Palette {
            enabled: true,
            muted: "\x1b[38;5;250m",
            reset: "\x1b[0m",
        },
        Some("solarized") => Palette {
            enabled: true,
            muted: "\x1b[38;5;108m",
            reset: "\x1b[0m",
        },
        _ => Palette {
            enabled: false,
            muted: "",
            reset: "",
        },
    }
}

pub fn canonical_theme_name(raw: &str) -> Option<String> {
    let mut cleaned = String::new();
    let mut previous_underscore = false;

    for ch in raw.chars() {
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
        return Some("default".into());
    }

    match trimmed {
        "vanilla" | "light" | "plain" => Some("default".to_string()),
        "dark" | "dark_mode" | "darkmode" => Some("noir".to_string()),
        other => Some(other.to_string()),
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub theme: Option<String>,
    #[serde(default)]
    pub default_user: Option<String>,
    #[serde(default)]
    pub scoring: ScoringRules,
}

#[derive(Debug, Clone)]
pub struct ConfigLoad {
    pub config: Config,
    pub error: Option<AppError>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScoringField {
    BasePoints,
    EarlyBonus,
    EarlyCutoffHour,
    FailurePenalty,
    MaxTitleLen,
}

impl ScoringField {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "base_points" => Some(Self::BasePoints),
            "early_bonus" => Some(Self::EarlyBonus),
            "early_cutoff_hour" => Some(Self::EarlyCutoffHour),
            "failure_penalty" => Some(Self::FailurePenalty),
            "max_title_len" => Some(Self::MaxTitleLen),
            _ => None,
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub theme: Option<String>,
    pub default_user: Option<String>,
    pub scoring: Vec<(ScoringField, String)>,
}

pub fn config_path() -> Result<PathBuf, AppError> {
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR)
        && !path.trim().is_empty()
    {
        return Ok(PathBuf::from(path));
    }

    if cfg!(windows) {
        let appdata =
            std::env::var("APPDATA").map_err(|_| AppError::invalid_data("APPDATA is not set"))?;
        Ok(PathBuf::from(appdata).join("tally").join(CONFIG_FILE_NAME))
    } else {
        let home = std::env::var("HOME").map_err(|_| AppError::invalid_data("HOME is not set"))?;
        Ok(PathBuf::from(home)
            .join(".config")
            .join("tally")
            .join(CONFIG_FILE_NAME))
    }
}

pub fn load_config_with_fallback() -> ConfigLoad {
    match config_path() {
        Ok(path) => load_config_with_fallback_from_path(&path),
        Err(err) => ConfigLoad {
            config: Config::default(),
            error: Some(err),
        },
    }
}

fn load_config_with_fallback_from_path(path: &Path) -> ConfigLoad {
    if !path.exists() {
        return ConfigLoad {
            config: Config::default(),
            error: None,
        };
    }

    match load_config_from_path(path) {
        Ok(config) => ConfigLoad {
            config,
            error: None,
        },
        Err(err) => ConfigLoad {
            config: Config::default(),
            error: Some(err),
        },
    }
}

fn load_config_from_path(path: &Path) -> Result<Config, AppError> {
    let content = std::fs::read_to_string(path)
        .map_err(|err| AppError::persistence(format!("{}: {}", path.display(), err)))?;
    let mut config: Config = serde_json::from_str(&content).map_err(|err| {
        AppError::invalid_data(format!("invalid JSON in {}: {}", path.display(), err))
    })?;
    config.scoring.validate()?;
    config.theme = config.theme.and_then(|name| canonical_theme_name(&name));
    config.default_user = normalize_user(config.default_user);
    Ok(config)
}

fn normalize_user(value: Option<String>) -> Option<String> {
    value
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
}

pub fn merge_overrides(base: &Config, overrides: &ConfigOverrides) -> Result<Config, AppError> {
    let mut merged = base.clone();
    if let Some(theme) = overrides.theme.as_ref()
        && let Some(normalized) = canonical_theme_name(theme)
    {
        merged.theme = Some(normalized);
    }

    if let Some(user) = normalize_user(overrides.default_user.clone()) {
        merged.default_user = Some(user);
    }

    for (field, value) in &overrides.scoring {
        apply_scoring_override(&mut merged.scoring, field, value)?;
    }
    merged.scoring.validate()?;

    Ok(merged)
}

fn apply_scoring_override(
    rules: &mut ScoringRules,
    field: &ScoringField,
    value: &str,
) -> Result<(), AppError> {
    let value = value.trim();
    let invalid = |name: &str| AppError::invalid_input(format!("{name} must be a number"));
    match field {
        ScoringField::BasePoints => {
            rules.base_points = value.parse().map_err(|_| invalid("base_points"))?;
        }
        ScoringField::EarlyBonus => {
            rules.early_bonus = value.parse().map_err(|_| invalid("early_bonus"))?;
        }
        ScoringField::EarlyCutoffHour => {
            rules.early_cutoff_hour = value.parse().map_err(|_| invalid("early_cutoff_hour"))?;
        }
        ScoringField::FailurePenalty => {
            rules.failure_penalty = value.parse().map_err(|_| invalid("failure_penalty"))?;
        }
        ScoringField::MaxTitleLen => {
            rules.max_title_len = value.parse().map_err(|_| invalid("max_title_len"))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{
        Config, ConfigOverrides, ScoringField, canonical_theme_name, load_config_from_path,
        load_config_with_fallback_from_path, merge_overrides, palette_for_theme,
    };
    use crate::scoring::ScoringRules;
    use std::fs;
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_path(file_name: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        std::env::temp_dir().join(format!("tally-{nanos}-{file_name}"))
    }

    #[test]
    fn load_config_missing_returns_defaults_without_error() {
        let path = temp_path("missing-config.json");
        let result = load_config_with_fallback_from_path(&path);

        assert_eq!(result.config, Config::default());
        assert!(result.error.is_none());
    }

    #[test]
    fn load_config_invalid_returns_defaults_and_error() {
        let path = temp_path("invalid-config.json");
        fs::write(&path, "{ invalid json ").unwrap();

        let result = load_config_with_fallback_from_path(&path);
        fs::remove_file(&path).ok();

        assert_eq!(result.config, Config::default());
        assert_eq!(result.error.unwrap().code(), "invalid_data");
    }

    #[test]
    fn load_config_reads_partial_scoring() {
        let path = temp_path("valid-config.json");
        let content = serde_json::json!({
            "theme": "Dark Mode",
            "default_user": "  user-1 ",
            "scoring": { "early_bonus": 8 }
        });
        fs::write(&path, serde_json::to_string(&content).unwrap()).unwrap();

        let loaded = load_config_from_path(&path).unwrap();
        fs::remove_file(&path).ok();

        assert_eq!(loaded.theme.as_deref(), Some("noir"));
        assert_eq!(loaded.default_user.as_deref(), Some("user-1"));
        assert_eq!(loaded.scoring.early_bonus, 8);
        assert_eq!(loaded.scoring.base_points, 10);
    }

    #[test]
    fn load_config_rejects_invalid_rules() {
        let path = temp_path("bad-rules.json");
        let content = serde_json::json!({ "scoring": { "max_title_len": 0 } });
        fs::write(&path, content.to_string()).unwrap();

        let err = load_config_from_path(&path).unwrap_err();
        fs::remove_file(&path).ok();

        assert_eq!(err.code(), "invalid_data");
    }

    #[test]
    fn merge_overrides_updates_fields_and_preserves_base() {
        let base = Config {
            theme: Some("default".into()),
            default_user: Some("user-1".into()),
            scoring: ScoringRules::default(),
        };
        let overrides = ConfigOverrides {
            theme: Some("noir".into()),
            default_user: Some("user-2".into()),
            scoring: vec![(ScoringField::BasePoints, "20".into())],
        };

        let merged = merge_overrides(&base, &overrides).unwrap();

        assert_eq!(merged.theme.as_deref(), Some("noir"));
        assert_eq!(merged.default_user.as_deref(), Some("user-2"));
        assert_eq!(merged.scoring.base_points, 20);
        assert_eq!(base.scoring.base_points, 10);
        assert_eq!(base.default_user.as_deref(), Some("user-1"));
    }

    #[test]
    fn merge_overrides_rejects_non_numeric_rule() {
        let overrides = ConfigOverrides {
            scoring: vec![(ScoringField::EarlyBonus, "lots".into())],
            ..ConfigOverrides::default()
        };

        let err = merge_overrides(&Config::default(), &overrides).unwrap_err();
        assert_eq!(err.code(), "invalid_input");
    }

    #[test]
    fn merge_overrides_with_empty_overrides_returns_clone() {
        let base = Config {
            theme: Some("solarized".into()),
            default_user: None,
            scoring: ScoringRules::default(),
        };

        let merged = merge_overrides(&base, &ConfigOverrides::default()).unwrap();

        assert_eq!(merged, base);
    }

    #[test]
    fn canonical_theme_name_maps_variants() {
        assert_eq!(canonical_theme_name("Vanilla"), Some("default".into()));
        assert_eq!(canonical_theme_name("Noir"), Some("noir".into()));
        assert_eq!(canonical_theme_name("dark-mode"), Some("noir".into()));
        assert_eq!(canonical_theme_name("  "), Some("default".into()));
    }

    #[test]
    fn palette_colors_only_when_themed() {
        let plain = palette_for_theme(Some("vanilla"));
        assert_eq!(plain.colorize("blue", "Rising Star"), "Rising Star");

        let noir = palette_for_theme(Some("noir"));
        assert_eq!(
            noir.colorize("blue", "Rising Star"),
            "\x1b[38;5;33mRising Star\x1b[0m"
        );
        assert_eq!(noir.colorize("teal", "x"), "x");
    }
}
