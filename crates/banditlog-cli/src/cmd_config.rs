use banditlog_ledger::{BanditPaths, ExperimentConfig};
use clap::Subcommand;
use std::path::Path;

// ── CLI Schema ──

#[derive(Subcommand)]
pub enum ConfigCmd {
    /// Set a config value
    Set {
        /// Config key (e.g. sheet_id, flush_threshold)
        key: String,
        /// Config value (true/false/number/string)
        value: String,
    },
    /// Get a config value
    Get {
        /// Config key
        key: String,
    },
    /// List all config values
    List,
}

// ── Dispatch ──

pub fn run(cmd: ConfigCmd, repo_root: &Path) -> anyhow::Result<()> {
    match cmd {
        ConfigCmd::Set { key, value } => set(repo_root, &key, &value),
        ConfigCmd::Get { key } => get(repo_root, &key),
        ConfigCmd::List => list(repo_root),
    }
}

// ── Command Implementations ──

const SECRET_KEYS: &[&str] = &["access_token"];

fn open_paths(repo_root: &Path) -> anyhow::Result<BanditPaths> {
    let root = BanditPaths::find_root(repo_root).ok_or_else(|| {
        anyhow::anyhow!("No .banditlog/ workspace found. Run `banditlog init` first.")
    })?;
    Ok(BanditPaths::discover(root))
}

/// Read config from `.banditlog/config.json`. Returns empty map if file doesn't exist.
fn read_config(path: &Path) -> anyhow::Result<serde_json::Map<String, serde_json::Value>> {
    let Some(content) = banditlog_store::read_optional(path)? else {
        return Ok(serde_json::Map::new());
    };
    let val: serde_json::Value = serde_json::from_str(&content)?;
    match val {
        serde_json::Value::Object(map) => Ok(map),
        _ => Ok(serde_json::Map::new()),
    }
}

/// Write config to `.banditlog/config.json`.
fn write_config(
    path: &Path,
    config: &serde_json::Map<String, serde_json::Value>,
) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(&config)?;
    banditlog_store::write_atomic(path, json.as_bytes())
}

/// Parse a string value into an appropriate JSON value (bool/number/string).
fn parse_value(s: &str) -> serde_json::Value {
    match s {
        "true" => serde_json::Value::Bool(true),
        "false" => serde_json::Value::Bool(false),
        "null" => serde_json::Value::Null,
        _ => {
            if let Ok(n) = s.parse::<i64>() {
                serde_json::Value::Number(n.into())
            } else if let Ok(f) = s.parse::<f64>() {
                serde_json::json!(f)
            } else {
                serde_json::Value::String(s.to_string())
            }
        }
    }
}

/// Reject unknown keys and values that would not load.
fn check(config: &serde_json::Map<String, serde_json::Value>, key: &str) -> anyhow::Result<()> {
    let defaults = serde_json::to_value(ExperimentConfig::default())?;
    let known = defaults
        .as_object()
        .is_some_and(|m| m.contains_key(key))
        || SECRET_KEYS.contains(&key);
    if !known {
        anyhow::bail!("unknown config key `{key}`");
    }
    let parsed: ExperimentConfig =
        serde_json::from_value(serde_json::Value::Object(config.clone()))
            .map_err(|e| anyhow::anyhow!("invalid value for `{key}`: {e}"))?;
    parsed.validate()?;
    Ok(())
}

fn display(key: &str, val: &serde_json::Value) -> String {
    if SECRET_KEYS.contains(&key) && !val.is_null() {
        "(hidden)".to_string()
    } else {
        val.to_string()
    }
}

/// `banditlog config set <key> <value>`
pub fn set(repo_root: &Path, key: &str, value: &str) -> anyhow::Result<()> {
    let paths = open_paths(repo_root)?;
    let mut config = read_config(&paths.config_json)?;
    // Sheet ids and worksheet names are strings even when they look numeric.
    let val = match key {
        "sheet_id" | "log_worksheet" | "summary_worksheet" | "access_token" => {
            serde_json::Value::String(value.to_string())
        }
        _ => parse_value(value),
    };
    config.insert(key.to_string(), val.clone());
    check(&config, key)?;
    write_config(&paths.config_json, &config)?;
    println!("{key} = {}", display(key, &val));
    Ok(())
}

/// `banditlog config get <key>`
pub fn get(repo_root: &Path, key: &str) -> anyhow::Result<()> {
    let paths = open_paths(repo_root)?;
    let config = read_config(&paths.config_json)?;
    match config.get(key) {
        Some(val) => println!("{}", display(key, val)),
        None => println!("(not set)"),
    }
    Ok(())
}

/// `banditlog config list`
pub fn list(repo_root: &Path) -> anyhow::Result<()> {
    let paths = open_paths(repo_root)?;
    let config = read_config(&paths.config_json)?;
    if config.is_empty() {
        println!("(no config set)");
    } else {
        for (k, v) in &config {
            println!("{k} = {}", display(k, v));
        }
    }
    Ok(())
}
