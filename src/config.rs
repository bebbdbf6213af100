use crate::types::*;
use chrono::Local;
use std::{
  env,
  fs,
  io::Write,
  path::{Path, PathBuf},
};

pub fn config_path() -> PathBuf {
  env_default("SONG_BRACKET_CONFIG")
    .map(PathBuf::from)
    .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME))
}

pub fn env_default(key: &str) -> Option<String> {
  env::var(key)
    .ok()
    .map(|value| value.trim().to_string())
    .filter(|value| !value.is_empty())
}

pub fn parse_flag(value: &str) -> bool {
  let value = value.trim().to_ascii_lowercase();
  matches!(value.as_str(), "1" | "true" | "yes" | "on")
}

/// Split a comma separated extension list, dropping blanks and leading dots.
pub fn parse_extension_list(raw: &str) -> Vec<String> {
  raw
    .split(',')
    .map(|ext| ext.trim().trim_start_matches('.').to_ascii_lowercase())
    .filter(|ext| !ext.is_empty())
    .collect()
}

pub fn apply_env_defaults(config: AppConfig) -> AppConfig {
  apply_overrides(config, env_default)
}

/// Apply `SONG_BRACKET_*` overrides read through `lookup`.
pub fn apply_overrides<F>(mut config: AppConfig, lookup: F) -> AppConfig
where
  F: Fn(&str) -> Option<String>,
{
  if let Some(value) = lookup("SONG_BRACKET_EXTENSIONS") {
    config.allowed_extensions = parse_extension_list(&value);
  }
  if let Some(value) = lookup("SONG_BRACKET_LOGS_DIR") {
    config.logs_dir = value;
  }
  if let Some(value) = lookup("SONG_BRACKET_RESULTS_LOG") {
    config.results_log = parse_flag(&value);
  }
  config
}

pub fn load_config_inner() -> Result<AppConfig, String> {
  load_config_from(&config_path()).map(apply_env_defaults)
}

/// Read a config file without env overrides. A missing file yields defaults.
pub fn load_config_from(path: &Path) -> Result<AppConfig, String> {
  if !path.is_file() {
    return Ok(AppConfig::default());
  }
  let data = fs::read_to_string(path).map_err(|e| format!("read config {}: {e}", path.display()))?;
  serde_json::from_str::<AppConfig>(&data).map_err(|e| format!("parse config {}: {e}", path.display()))
}

pub fn save_config_to(path: &Path, config: &AppConfig) -> Result<(), String> {
  let payload = serde_json::to_string_pretty(config).map_err(|e| e.to_string())?;
  fs::write(path, payload).map_err(|e| format!("write config {}: {e}", path.display()))
}

pub fn save_config_inner(config: AppConfig) -> Result<AppConfig, String> {
  save_config_to(&config_path(), &config)?;
  Ok(config)
}

/// Load `.env` from the working directory without overriding variables
/// that are already set.
pub fn load_env_file() {
  let env_path = PathBuf::from(".env");
  if !env_path.is_file() {
    return;
  }
  let contents = match fs::read_to_string(&env_path) {
    Ok(data) => data,
    Err(_) => return,
  };
  for line in contents.lines() {
    if let Some((key, value)) = parse_env_line(line) {
      if env::var_os(&key).is_none() {
        env::set_var(key, value);
      }
    }
  }
}

pub fn parse_env_line(line: &str) -> Option<(String, String)> {
  let trimmed = line.trim();
  if trimmed.is_empty() || trimmed.starts_with('#') {
    return None;
  }
  let trimmed = trimmed.strip_prefix("export ").unwrap_or(trimmed);
  let (key, raw_value) = trimmed.split_once('=')?;
  let key = key.trim();
  if key.is_empty() {
    return None;
  }
  let mut value = raw_value.trim();
  if value.starts_with('"') && value.ends_with('"') && value.len() >= 2 {
    value = &value[1..value.len() - 1];
  } else if value.starts_with('\'') && value.ends_with('\'') && value.len() >= 2 {
    value = &value[1..value.len() - 1];
  } else if let Some(idx) = value.find('#') {
    value = value[..idx].trim_end();
  }
  Some((key.to_string(), value.to_string()))
}

pub fn logs_dir(config: &AppConfig) -> PathBuf {
  PathBuf::from(config.logs_dir.trim())
}

pub fn results_log_path(config: &AppConfig) -> PathBuf {
  logs_dir(config).join(RESULTS_LOG_FILE_NAME)
}

/// Append one timestamped line per finished tournament.
pub fn append_results_log(config: &AppConfig, champion: &Competitor, entrant_count: usize) {
  if !config.results_log {
    return;
  }
  let dir = logs_dir(config);
  if fs::create_dir_all(&dir).is_err() {
    return;
  }
  let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
  let entry = format!(
    "[{timestamp}] champion={} source={} entrants={entrant_count}\n",
    champion.name, champion.source_ref
  );
  if let Ok(mut file) = fs::OpenOptions::new()
    .create(true)
    .append(true)
    .open(results_log_path(config))
  {
    if let Err(e) = file.write_all(entry.as_bytes()) {
      tracing::warn!("write results log: {e}");
    }
  }
}

pub fn log_config_warnings(config: &AppConfig) {
  if config.allowed_extensions.is_empty() {
    tracing::warn!("No allowed extensions configured; every source will be accepted");
  }
  if config.logs_dir.trim().is_empty() {
    tracing::warn!("logsDir is empty; logs go to the working directory");
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::collections::HashMap;

  #[test]
  fn test_parse_env_line_variants() {
    assert_eq!(parse_env_line("KEY=value"), Some(("KEY".into(), "value".into())));
    assert_eq!(
      parse_env_line("export KEY=\"quoted # kept\""),
      Some(("KEY".into(), "quoted # kept".into()))
    );
    assert_eq!(parse_env_line("KEY='single'"), Some(("KEY".into(), "single".into())));
    assert_eq!(parse_env_line("KEY=value # trailing"), Some(("KEY".into(), "value".into())));
    assert_eq!(parse_env_line("# comment"), None);
    assert_eq!(parse_env_line("   "), None);
    assert_eq!(parse_env_line("=orphan"), None);
    assert_eq!(parse_env_line("NO_EQUALS"), None);
  }

  #[test]
  fn test_parse_extension_list() {
    assert_eq!(parse_extension_list("mp3, .FLAC,,ogg "), vec!["mp3", "flac", "ogg"]);
    assert!(parse_extension_list(" , ").is_empty());
  }

  #[test]
  fn test_overrides_replace_file_values() {
    let vars: HashMap<&str, &str> = [
      ("SONG_BRACKET_EXTENSIONS", "wav,ogg"),
      ("SONG_BRACKET_RESULTS_LOG", "off"),
    ]
    .into_iter()
    .collect();
    let config = apply_overrides(AppConfig::default(), |key| vars.get(key).map(|v| v.to_string()));

    assert_eq!(config.allowed_extensions, vec!["wav", "ogg"]);
    assert!(!config.results_log);
    assert_eq!(config.logs_dir, "logs");
  }

  #[test]
  fn test_missing_config_file_uses_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = load_config_from(&dir.path().join("absent.json")).unwrap();
    assert_eq!(config, AppConfig::default());
  }

  #[test]
  fn test_config_save_and_partial_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");

    let config = AppConfig {
      allowed_extensions: vec!["flac".to_string()],
      logs_dir: "out".to_string(),
      results_log: false,
    };
    save_config_to(&path, &config).unwrap();
    assert_eq!(load_config_from(&path).unwrap(), config);

    // Missing fields fall back to defaults
    fs::write(&path, r#"{ "logsDir": "elsewhere" }"#).unwrap();
    let loaded = load_config_from(&path).unwrap();
    assert_eq!(loaded.logs_dir, "elsewhere");
    assert_eq!(loaded.allowed_extensions, vec![DEFAULT_ALLOWED_EXTENSION]);

    fs::write(&path, "{ not json").unwrap();
    assert!(load_config_from(&path).unwrap_err().starts_with("parse config"));
  }

  #[test]
  fn test_append_results_log() {
    let dir = tempfile::tempdir().unwrap();
    let config = AppConfig {
      logs_dir: dir.path().join("logs").to_string_lossy().to_string(),
      ..AppConfig::default()
    };
    let champion = Competitor {
      id: CompetitorId(0),
      name: "Anthem".to_string(),
      source_ref: "anthem.mp3".to_string(),
    };
    append_results_log(&config, &champion, 4);
    append_results_log(&config, &champion, 8);

    let contents = fs::read_to_string(results_log_path(&config)).unwrap();
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].ends_with("champion=Anthem source=anthem.mp3 entrants=4"));

    let disabled = AppConfig {
      results_log: false,
      logs_dir: dir.path().join("quiet").to_string_lossy().to_string(),
      ..AppConfig::default()
    };
    append_results_log(&disabled, &champion, 2);
    assert!(!results_log_path(&disabled).exists());
  }
}
