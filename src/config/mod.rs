/// Configuration system for speckle-activity.
///
/// Provides a layered configuration hierarchy:
///
/// 1. **Built-in defaults**: hardcoded in [`schema::ActivityConfig::default()`]
/// 2. **User global config**: `~/.speckle-activity/config.toml`
/// 3. **Project local config**: `.speckle-activity.toml` in the working directory
/// 4. **Environment variables**: `SPECKLE_*` overrides (highest precedence)
///
/// Layers are merged key by key: a file that only sets `server.token` keeps
/// every other value from the layer below.
///
/// # Usage
///
/// ```rust,ignore
/// use speckle_activity::config;
///
/// let cfg = config::load();
/// let connector = SpeckleConnector::from_config(&cfg.server);
/// ```
pub mod schema;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

pub use schema::ActivityConfig;

const APP_DIR: &str = ".speckle-activity";
const PROJECT_FILE: &str = ".speckle-activity.toml";

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Load the fully resolved configuration.
///
/// Merges all layers in order: defaults → global TOML → project TOML → env
/// vars. Malformed files are skipped so a typo never blocks the dashboard;
/// `health` reports them.
pub fn load() -> ActivityConfig {
    let mut config = load_from(global_config_path(), project_config_path());
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    config
}

/// Load defaults merged with the given files, without env overrides.
pub fn load_from(global: Option<PathBuf>, project: Option<PathBuf>) -> ActivityConfig {
    let Ok(mut merged) = toml::Value::try_from(ActivityConfig::default()) else {
        return ActivityConfig::default();
    };

    for layer in [global, project].into_iter().flatten() {
        let Some(value) = load_toml_value(&layer) else {
            continue;
        };
        // A layer with a mistyped value is dropped on its own; the layers
        // below it still apply.
        let mut candidate = merged.clone();
        merge_toml(&mut candidate, value);
        if candidate.clone().try_into::<ActivityConfig>().is_ok() {
            merged = candidate;
        }
    }

    merged.try_into().unwrap_or_default()
}

/// Read a TOML file as a raw value tree.
///
/// Returns `None` if the file doesn't exist or the content is malformed.
fn load_toml_value(path: &Path) -> Option<toml::Value> {
    let content = fs::read_to_string(path).ok()?;
    toml::from_str(&content).ok()
}

/// Check whether a config file exists but fails to parse.
pub fn is_malformed(path: &Path) -> bool {
    match fs::read_to_string(path) {
        Ok(content) => toml::from_str::<ActivityConfig>(&content).is_err(),
        Err(_) => false,
    }
}

/// Deep-merge `overlay` into `base`: tables merge key by key, any other
/// value in the overlay replaces the base value.
fn merge_toml(base: &mut toml::Value, overlay: toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base_table), toml::Value::Table(overlay_table)) => {
            for (key, value) in overlay_table {
                match base_table.get_mut(&key) {
                    Some(existing) => merge_toml(existing, value),
                    None => {
                        base_table.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

// ---------------------------------------------------------------------------
// File paths
// ---------------------------------------------------------------------------

/// Path to the user global config: `~/.speckle-activity/config.toml`.
fn global_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(APP_DIR).join("config.toml"))
}

/// Path to the project local config in the current directory.
fn project_config_path() -> Option<PathBuf> {
    std::env::current_dir().ok().map(|cwd| cwd.join(PROJECT_FILE))
}

/// Return the path to the global config file for display/init purposes.
pub fn global_config_file() -> Option<PathBuf> {
    global_config_path()
}

/// Return the path to the project config file for display purposes.
pub fn project_config_file() -> Option<PathBuf> {
    project_config_path()
}

/// Expand a leading `~` to the home directory.
pub fn expand_home(path: &str) -> Option<PathBuf> {
    match path.strip_prefix('~') {
        Some(rest) => {
            let rest = rest.trim_start_matches(['/', '\\']);
            dirs::home_dir().map(|home| home.join(rest))
        }
        None => Some(PathBuf::from(path)),
    }
}

// ---------------------------------------------------------------------------
// Environment variable overrides
// ---------------------------------------------------------------------------

/// Apply environment variable overrides (highest precedence layer).
///
/// Supported variables:
/// - `SPECKLE_SERVER`: server address
/// - `SPECKLE_TOKEN`: access token
/// - `SPECKLE_COMMIT_LIMIT`: commits fetched per stream
/// - `SPECKLE_TIMEOUT_MS`: HTTP request timeout
/// - `SPECKLE_WEB_ADDR`: web dashboard bind address
/// - `SPECKLE_ACTIVITY_LOG`: render log on/off (`1`/`true`/`yes`/`on`)
///
/// `lookup` abstracts `std::env::var` so the layer can be tested without
/// touching the process environment.
pub fn apply_env_overrides<F>(config: &mut ActivityConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(val) = lookup("SPECKLE_SERVER")
        && !val.trim().is_empty()
    {
        config.server.url = val;
    }
    if let Some(val) = lookup("SPECKLE_TOKEN")
        && !val.trim().is_empty()
    {
        config.server.token = val;
    }
    if let Some(val) = lookup("SPECKLE_COMMIT_LIMIT")
        && let Ok(n) = val.parse::<usize>()
    {
        config.server.commit_limit = n;
    }
    if let Some(val) = lookup("SPECKLE_TIMEOUT_MS")
        && let Ok(ms) = val.parse::<u64>()
    {
        config.server.timeout_ms = ms;
    }
    if let Some(val) = lookup("SPECKLE_WEB_ADDR")
        && !val.trim().is_empty()
    {
        config.web.addr = val;
    }
    if let Some(val) = lookup("SPECKLE_ACTIVITY_LOG") {
        config.logging.enabled = is_truthy(&val);
    }
}

/// Check if a string value represents a truthy boolean.
fn is_truthy(val: &str) -> bool {
    matches!(
        val.to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

// ---------------------------------------------------------------------------
// Config init / set / reset
// ---------------------------------------------------------------------------

/// Write the default annotated config to `~/.speckle-activity/config.toml`.
///
/// Creates the directory if it doesn't exist. Returns an error if the file
/// already exists (use `force = true` to overwrite).
pub fn init_config(force: bool) -> Result<PathBuf> {
    let path = global_config_path().context("could not determine home directory")?;
    init_config_at(&path, force)?;
    Ok(path)
}

/// [`init_config`] against an explicit path.
pub fn init_config_at(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {}. Use --force to overwrite.",
            path.display()
        );
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("failed to create config directory")?;
    }

    fs::write(path, ActivityConfig::default_toml()).context("failed to write config file")?;
    Ok(())
}

/// Set a single config key to a value in the global config file.
///
/// Supports dotted keys like `server.commit_limit`.
pub fn set_config_value(key: &str, value: &str) -> Result<()> {
    let path = global_config_path().context("could not determine home directory")?;
    set_config_value_at(&path, key, value)
}

/// [`set_config_value`] against an explicit path.
///
/// Reads the file (or the serialized defaults when it doesn't exist yet),
/// updates the key, and validates the result before writing it back.
pub fn set_config_value_at(path: &Path, key: &str, value: &str) -> Result<()> {
    let mut root: toml::Value = if path.exists() {
        let content = fs::read_to_string(path).context("failed to read config file")?;
        toml::from_str(&content).context("failed to parse config as TOML value")?
    } else {
        toml::Value::try_from(ActivityConfig::default())
            .context("failed to serialize default config")?
    };

    // Keys missing from a hand-written file still resolve against defaults.
    let defaults =
        toml::Value::try_from(ActivityConfig::default()).context("failed to serialize defaults")?;
    let mut full = defaults;
    merge_toml(&mut full, root.clone());
    set_toml_value(&mut full, key, value)?;
    let _: ActivityConfig = full
        .clone()
        .try_into()
        .with_context(|| format!("invalid value for '{key}': '{value}'"))?;

    let (section, leaf) = key.rsplit_once('.').unwrap_or(("", key));
    let updated = lookup_toml(&full, key)
        .cloned()
        .with_context(|| format!("config key not found: '{key}'"))?;
    let table = if section.is_empty() {
        root.as_table_mut()
    } else {
        ensure_table(&mut root, section)?.as_table_mut()
    }
    .with_context(|| format!("expected table at '{section}'"))?;
    table.insert(leaf.to_string(), updated);

    let output = toml::to_string_pretty(&root).context("failed to serialize updated config")?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("failed to create config directory")?;
    }
    fs::write(path, output).context("failed to write config file")?;

    Ok(())
}

/// Walk a dotted key path, creating missing tables along the way.
fn ensure_table<'a>(root: &'a mut toml::Value, dotted: &str) -> Result<&'a mut toml::Value> {
    let mut current = root;
    for part in dotted.split('.') {
        let table = current
            .as_table_mut()
            .with_context(|| format!("expected table above '{part}'"))?;
        current = table
            .entry(part.to_string())
            .or_insert(toml::Value::Table(toml::map::Map::new()));
    }
    Ok(current)
}

fn lookup_toml<'a>(root: &'a toml::Value, dotted: &str) -> Option<&'a toml::Value> {
    dotted.split('.').try_fold(root, |node, part| node.get(part))
}

/// Set a value in a TOML value tree using a dotted key path.
///
/// The key must already exist; its current type decides how `raw_value` is
/// parsed.
fn set_toml_value(root: &mut toml::Value, key: &str, raw_value: &str) -> Result<()> {
    let parts: Vec<&str> = key.split('.').collect();
    let Some((leaf, sections)) = parts.split_last() else {
        anyhow::bail!("empty config key");
    };

    let mut current = root;
    for &part in sections {
        current = current
            .get_mut(part)
            .with_context(|| format!("config key not found: section '{part}' in '{key}'"))?;
    }

    let table = current.as_table_mut().with_context(|| {
        format!(
            "expected table at '{}'",
            key.rsplit_once('.').map(|(s, _)| s).unwrap_or("")
        )
    })?;

    let new_value = match table.get(*leaf) {
        Some(toml::Value::Boolean(_)) => toml::Value::Boolean(is_truthy(raw_value)),
        Some(toml::Value::Integer(_)) => {
            let n: i64 = raw_value
                .parse()
                .with_context(|| format!("expected integer for '{key}', got '{raw_value}'"))?;
            toml::Value::Integer(n)
        }
        Some(toml::Value::Float(_)) => {
            let f: f64 = raw_value
                .parse()
                .with_context(|| format!("expected float for '{key}', got '{raw_value}'"))?;
            toml::Value::Float(f)
        }
        Some(_) => toml::Value::String(raw_value.to_string()),
        None => anyhow::bail!("config key not found: '{key}'"),
    };

    table.insert(leaf.to_string(), new_value);
    Ok(())
}

/// Reset the global config to defaults (overwrite the file).
pub fn reset_config() -> Result<PathBuf> {
    init_config(true)
}

/// Show the effective config as TOML, token redacted.
pub fn show_effective_config(config: &ActivityConfig) -> Result<String> {
    toml::to_string_pretty(&config.redacted()).context("failed to serialize effective config")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
