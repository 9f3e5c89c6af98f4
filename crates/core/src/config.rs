use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::approval::Actor;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppConfig {
    pub logging: LoggingConfig,
    pub workflow: WorkflowConfig,
    pub address: AddressConfig,
    pub directory: BTreeMap<String, String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkflowConfig {
    pub min_rejection_comment_len: usize,
    pub supervisor_role: String,
    pub read_only: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AddressConfig {
    pub default_tie_break: DefaultTieBreak,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

/// Which default survives when a bulk replacement carries several.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefaultTieBreak {
    First,
    #[default]
    Last,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub log_level: Option<String>,
    pub log_format: Option<LogFormat>,
    pub min_rejection_comment_len: Option<usize>,
    pub supervisor_role: Option<String>,
    pub read_only: Option<bool>,
    pub default_tie_break: Option<DefaultTieBreak>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            min_rejection_comment_len: 10,
            supervisor_role: "Supervisor".to_string(),
            read_only: false,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
            workflow: WorkflowConfig::default(),
            address: AddressConfig { default_tie_break: DefaultTieBreak::Last },
            directory: default_directory(),
        }
    }
}

fn default_directory() -> BTreeMap<String, String> {
    BTreeMap::from([
        ("Supervisor".to_string(), "Jane Smith".to_string()),
        ("Manager".to_string(), "Bob Wilson".to_string()),
        ("Reviewer".to_string(), "John Doe".to_string()),
    ])
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl std::str::FromStr for DefaultTieBreak {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "first" => Ok(Self::First),
            "last" => Ok(Self::Last),
            other => Err(ConfigError::Validation(format!(
                "unsupported default tie break `{other}` (expected first|last)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("pdesk.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    /// Resolves the person holding `role` in the configured directory.
    pub fn actor_for_role(&self, role: &str) -> Option<Actor> {
        let wanted = role.trim().to_ascii_lowercase();
        self.directory
            .iter()
            .find(|(candidate, _)| candidate.trim().to_ascii_lowercase() == wanted)
            .map(|(candidate, name)| Actor::new(candidate.clone(), name.clone()))
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }

        if let Some(workflow) = patch.workflow {
            if let Some(min_len) = workflow.min_rejection_comment_len {
                self.workflow.min_rejection_comment_len = min_len;
            }
            if let Some(supervisor_role) = workflow.supervisor_role {
                self.workflow.supervisor_role = supervisor_role;
            }
            if let Some(read_only) = workflow.read_only {
                self.workflow.read_only = read_only;
            }
        }

        if let Some(address) = patch.address {
            if let Some(tie_break) = address.default_tie_break {
                self.address.default_tie_break = tie_break;
            }
        }

        if let Some(directory) = patch.directory {
            self.directory.extend(directory);
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        let log_level = read_env("PDESK_LOGGING_LEVEL").or_else(|| read_env("PDESK_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format = read_env("PDESK_LOGGING_FORMAT").or_else(|| read_env("PDESK_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        if let Some(value) = read_env("PDESK_WORKFLOW_MIN_REJECTION_COMMENT_LEN") {
            self.workflow.min_rejection_comment_len =
                parse_usize("PDESK_WORKFLOW_MIN_REJECTION_COMMENT_LEN", &value)?;
        }
        if let Some(value) = read_env("PDESK_WORKFLOW_SUPERVISOR_ROLE") {
            self.workflow.supervisor_role = value;
        }
        if let Some(value) = read_env("PDESK_WORKFLOW_READ_ONLY") {
            self.workflow.read_only = parse_bool("PDESK_WORKFLOW_READ_ONLY", &value)?;
        }

        if let Some(value) = read_env("PDESK_ADDRESS_DEFAULT_TIE_BREAK") {
            self.address.default_tie_break = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(log_format) = overrides.log_format {
            self.logging.format = log_format;
        }
        if let Some(min_len) = overrides.min_rejection_comment_len {
            self.workflow.min_rejection_comment_len = min_len;
        }
        if let Some(supervisor_role) = overrides.supervisor_role {
            self.workflow.supervisor_role = supervisor_role;
        }
        if let Some(read_only) = overrides.read_only {
            self.workflow.read_only = read_only;
        }
        if let Some(tie_break) = overrides.default_tie_break {
            self.address.default_tie_break = tie_break;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_logging(&self.logging)?;
        validate_workflow(&self.workflow)?;
        validate_directory(&self.directory)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("pdesk.toml"), PathBuf::from("config/pdesk.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn validate_workflow(workflow: &WorkflowConfig) -> Result<(), ConfigError> {
    if workflow.min_rejection_comment_len == 0 || workflow.min_rejection_comment_len > 500 {
        return Err(ConfigError::Validation(
            "workflow.min_rejection_comment_len must be in range 1..=500".to_string(),
        ));
    }

    if workflow.supervisor_role.trim().is_empty() {
        return Err(ConfigError::Validation(
            "workflow.supervisor_role must not be blank".to_string(),
        ));
    }

    Ok(())
}

fn validate_directory(directory: &BTreeMap<String, String>) -> Result<(), ConfigError> {
    if let Some((role, _)) = directory.iter().find(|(_, name)| name.trim().is_empty()) {
        return Err(ConfigError::Validation(format!(
            "directory.{role} must name a person (got an empty value)"
        )));
    }

    Ok(())
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_usize(key: &str, value: &str) -> Result<usize, ConfigError> {
    value.trim().parse::<usize>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.trim().parse::<bool>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    logging: Option<LoggingPatch>,
    workflow: Option<WorkflowPatch>,
    address: Option<AddressPatch>,
    directory: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[derive(Debug, Default, Deserialize)]
struct WorkflowPatch {
    min_rejection_comment_len: Option<usize>,
    supervisor_role: Option<String>,
    read_only: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct AddressPatch {
    default_tie_break: Option<DefaultTieBreak>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};

    use tempfile::TempDir;

    use super::{AppConfig, ConfigError, ConfigOverrides, DefaultTieBreak, LoadOptions, LogFormat};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    const VARS: [&str; 8] = [
        "PDESK_LOGGING_LEVEL",
        "PDESK_LOG_LEVEL",
        "PDESK_LOGGING_FORMAT",
        "PDESK_LOG_FORMAT",
        "PDESK_WORKFLOW_MIN_REJECTION_COMMENT_LEN",
        "PDESK_WORKFLOW_SUPERVISOR_ROLE",
        "PDESK_WORKFLOW_READ_ONLY",
        "PDESK_ADDRESS_DEFAULT_TIE_BREAK",
    ];

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn defaults_load_without_file_or_env() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(&VARS);

        let config = AppConfig::load(LoadOptions::default())
            .map_err(|err| format!("config load failed: {err}"))?;

        ensure(config.workflow.min_rejection_comment_len == 10, "rejection minimum is 10")?;
        ensure(config.workflow.supervisor_role == "Supervisor", "supervisor role default")?;
        ensure(
            config.address.default_tie_break == DefaultTieBreak::Last,
            "last default wins unless configured",
        )?;
        ensure(
            config.actor_for_role("manager").map(|actor| actor.name)
                == Some("Bob Wilson".to_string()),
            "directory resolves roles case-insensitively",
        )
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(&VARS);
        env::set_var("TEST_PDESK_DIRECTOR", "Dana Director");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("pdesk.toml");
            fs::write(
                &path,
                r#"
[directory]
Director = "${TEST_PDESK_DIRECTOR}"

[address]
default_tie_break = "first"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.directory.get("Director").map(String::as_str) == Some("Dana Director"),
                "director should be interpolated from environment",
            )?;
            ensure(
                config.directory.contains_key("Manager"),
                "file directory entries extend the defaults",
            )?;
            ensure(
                config.address.default_tie_break == DefaultTieBreak::First,
                "tie break should come from the file",
            )
        })();

        clear_vars(&["TEST_PDESK_DIRECTOR"]);
        result
    }

    #[test]
    fn logging_env_aliases_are_supported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(&VARS);
        env::set_var("PDESK_LOG_LEVEL", "warn");
        env::set_var("PDESK_LOG_FORMAT", "pretty");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.logging.level == "warn", "warning log level should be set from env var")?;
            ensure(
                matches!(config.logging.format, LogFormat::Pretty),
                "pretty logging format should be set from env var",
            )
        })();

        clear_vars(&VARS);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(&VARS);
        env::set_var("PDESK_WORKFLOW_MIN_REJECTION_COMMENT_LEN", "20");
        env::set_var("PDESK_WORKFLOW_SUPERVISOR_ROLE", "Lead");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("pdesk.toml");
            fs::write(
                &path,
                r#"
[workflow]
min_rejection_comment_len = 15
supervisor_role = "Team Lead"
read_only = true

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    log_level: Some("debug".to_string()),
                    read_only: Some(false),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.logging.level == "debug", "override log level should win")?;
            ensure(!config.workflow.read_only, "override read-only flag should win")?;
            ensure(
                config.workflow.min_rejection_comment_len == 20,
                "env minimum should win over the file",
            )?;
            ensure(config.workflow.supervisor_role == "Lead", "env role should win over the file")
        })();

        clear_vars(&VARS);
        result
    }

    #[test]
    fn validation_fails_fast_with_actionable_error() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(&VARS);
        env::set_var("PDESK_WORKFLOW_MIN_REJECTION_COMMENT_LEN", "0");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message)
                    if message.contains("workflow.min_rejection_comment_len")
            );
            ensure(has_message, "validation failure should name the offending key")
        })();

        clear_vars(&VARS);
        result
    }

    #[test]
    fn malformed_env_override_is_reported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(&VARS);
        env::set_var("PDESK_WORKFLOW_READ_ONLY", "sometimes");

        let result = match AppConfig::load(LoadOptions::default()) {
            Err(ConfigError::InvalidEnvOverride { key, .. }) => {
                ensure(key == "PDESK_WORKFLOW_READ_ONLY", "error should name the env key")
            }
            Err(other) => Err(format!("unexpected error: {other}")),
            Ok(_) => Err("expected invalid env override".to_string()),
        };

        clear_vars(&VARS);
        result
    }
}
