use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use pdesk_core::config::{AppConfig, LoadOptions};
use toml::Value;

use crate::commands::CommandResult;

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "config",
                "config_validation",
                format!("config validation failed: {error}"),
                2,
            );
        }
    };

    CommandResult::success("config", render(&config))
}

/// Effective configuration, one `key = value (source: ...)` line per setting.
pub fn render(config: &AppConfig) -> String {
    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    let source = |key_path: &str, env_keys: &[&str]| {
        field_source(key_path, env_keys, config_file_doc.as_ref(), config_file_path.as_deref())
    };

    let settings = [
        (
            "logging.level",
            config.logging.level.clone(),
            &["PDESK_LOGGING_LEVEL", "PDESK_LOG_LEVEL"][..],
        ),
        (
            "logging.format",
            format!("{:?}", config.logging.format).to_ascii_lowercase(),
            &["PDESK_LOGGING_FORMAT", "PDESK_LOG_FORMAT"][..],
        ),
        (
            "workflow.min_rejection_comment_len",
            config.workflow.min_rejection_comment_len.to_string(),
            &["PDESK_WORKFLOW_MIN_REJECTION_COMMENT_LEN"][..],
        ),
        (
            "workflow.supervisor_role",
            config.workflow.supervisor_role.clone(),
            &["PDESK_WORKFLOW_SUPERVISOR_ROLE"][..],
        ),
        (
            "workflow.read_only",
            config.workflow.read_only.to_string(),
            &["PDESK_WORKFLOW_READ_ONLY"][..],
        ),
        (
            "address.default_tie_break",
            format!("{:?}", config.address.default_tie_break).to_ascii_lowercase(),
            &["PDESK_ADDRESS_DEFAULT_TIE_BREAK"][..],
        ),
    ];

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for (key, value, env_keys) in settings {
        lines.push(render_line(key, &value, source(key, env_keys)));
    }
    for (role, name) in &config.directory {
        let key = format!("directory.{role}");
        lines.push(render_line(&key, name, source(key.as_str(), &[])));
    }

    lines.join("\n")
}

fn detect_config_path() -> Option<PathBuf> {
    ["pdesk.toml", "config/pdesk.toml"].into_iter().map(PathBuf::from).find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}
