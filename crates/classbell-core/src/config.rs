use crate::notify::NotificationProviders;
use crate::resolve::RescheduleMap;
use crate::runtime::{DEFAULT_PREPARATION_MINUTES, RuntimeSettings};
use chrono::{Local, NaiveDate};
use dirs::config_dir;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const CONFIG_DIR_NAME: &str = "classbell";
const CONFIG_FILE_NAME: &str = "config.toml";
const SCHEDULES_DIR_NAME: &str = "schedules";
const DEFAULT_SCHEDULE_FILE: &str = "schedule.json";
const CURRENT_SCHEMA_VERSION: u32 = 1;

/// Largest accepted clock shift in either direction (366 days).
pub const MAX_TIME_OFFSET_SECONDS: i64 = 366 * 24 * 60 * 60;

/// Result returned by [`load_config`], capturing the source and any non-fatal issues.
#[derive(Debug, Clone)]
pub struct ConfigLoadResult {
    pub config: FileConfig,
    pub warnings: Vec<String>,
    pub source: ConfigSource,
}

/// Indicates where the configuration was loaded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    /// No usable configuration was found; defaults were synthesized.
    Default,
    /// Configuration was read from `config.toml`.
    File,
    /// `config.toml` exists but could not be used; defaults were synthesized and the file
    /// must not be overwritten.
    Fallback,
}

impl ConfigLoadResult {
    /// Whether saving would replace settings that were never loaded.
    pub fn would_discard_file(&self) -> bool {
        self.source == ConfigSource::Fallback
    }
}

/// Errors that can occur when persisting configuration.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Ser(toml::ser::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(err) => write!(f, "IO error: {err}"),
            ConfigError::Ser(err) => write!(f, "TOML serialization error: {err}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<toml::ser::Error> for ConfigError {
    fn from(value: toml::ser::Error) -> Self {
        Self::Ser(value)
    }
}

/// Disk-backed configuration schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default = "FileConfig::schema_version")]
    pub schema_version: u32,
    #[serde(default)]
    pub schedule: ScheduleSettings,
    #[serde(default)]
    pub notifications: NotificationSettings,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            schema_version: CURRENT_SCHEMA_VERSION,
            schedule: ScheduleSettings::default(),
            notifications: NotificationSettings::default(),
        }
    }
}

impl FileConfig {
    const fn schema_version() -> u32 {
        CURRENT_SCHEMA_VERSION
    }

    /// Engine inputs derived from this configuration. Reschedule entries that fail to
    /// parse are skipped; [`load_config`] already reports them.
    pub fn runtime_settings(&self) -> RuntimeSettings {
        let (reschedule, _) = RescheduleMap::from_raw(&self.schedule.reschedule_day);
        RuntimeSettings {
            time_offset_seconds: self.schedule.time_offset_seconds,
            preparation_minutes: self.schedule.preparation_minutes,
            reschedule,
            notifications_enabled: self.notifications.enabled,
        }
    }
}

/// Timetable selection and timing preferences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleSettings {
    /// Path to the active schedule document; empty selects the default location.
    #[serde(default)]
    pub current_schedule: String,
    #[serde(default)]
    pub time_offset_seconds: i64,
    #[serde(default = "ScheduleSettings::default_preparation_minutes")]
    pub preparation_minutes: u32,
    /// `YYYY-MM-DD` -> ISO weekday (1 = Monday).
    #[serde(default)]
    pub reschedule_day: BTreeMap<String, u8>,
}

impl Default for ScheduleSettings {
    fn default() -> Self {
        Self {
            current_schedule: String::new(),
            time_offset_seconds: 0,
            preparation_minutes: Self::default_preparation_minutes(),
            reschedule_day: BTreeMap::new(),
        }
    }
}

impl ScheduleSettings {
    const fn default_preparation_minutes() -> u32 {
        DEFAULT_PREPARATION_MINUTES
    }

    /// Resolved path of the schedule document, with `~` expanded.
    pub fn schedule_path(&self) -> PathBuf {
        let trimmed = self.current_schedule.trim();
        if trimmed.is_empty() {
            return default_schedule_path();
        }
        PathBuf::from(shellexpand::tilde(trimmed).into_owned())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationSettings {
    #[serde(default = "NotificationSettings::default_enabled")]
    pub enabled: bool,
    /// Keyed by provider id.
    #[serde(default)]
    pub providers: BTreeMap<String, ProviderSettings>,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            enabled: Self::default_enabled(),
            providers: BTreeMap::new(),
        }
    }
}

impl NotificationSettings {
    const fn default_enabled() -> bool {
        true
    }

    /// Copies the enabled flags onto the host's provider registry. Returns ids that
    /// matched no registered provider.
    pub fn apply_to(&self, providers: &mut NotificationProviders) -> Vec<String> {
        providers.set_enabled(self.enabled);
        self.providers
            .iter()
            .filter(|(id, settings)| !providers.set_provider_enabled(id, settings.enabled))
            .map(|(id, _)| id.clone())
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderSettings {
    #[serde(default = "ProviderSettings::default_enabled")]
    pub enabled: bool,
}

impl ProviderSettings {
    const fn default_enabled() -> bool {
        true
    }
}

/// Represents overrides sourced from runtime inputs (CLI flags).
#[derive(Debug, Default, Clone)]
pub struct RuntimeOverrides {
    pub schedule_path: Option<String>,
    pub time_offset_seconds: Option<i64>,
    pub preparation_minutes: Option<u32>,
}

impl RuntimeOverrides {
    pub fn is_empty(&self) -> bool {
        self.schedule_path.is_none()
            && self.time_offset_seconds.is_none()
            && self.preparation_minutes.is_none()
    }
}

/// Merge runtime overrides into an existing configuration.
pub fn apply_runtime_overrides(
    config: &mut FileConfig,
    overrides: &RuntimeOverrides,
    warnings: &mut Vec<String>,
) {
    if let Some(ref path) = overrides.schedule_path {
        config.schedule.current_schedule = path.clone();
    }
    if let Some(offset) = overrides.time_offset_seconds {
        if offset.abs() > MAX_TIME_OFFSET_SECONDS {
            warnings.push(format!(
                "Time offset {offset}s exceeds {MAX_TIME_OFFSET_SECONDS}s. Ignoring override."
            ));
        } else {
            config.schedule.time_offset_seconds = offset;
        }
    }
    if let Some(minutes) = overrides.preparation_minutes {
        if minutes == 0 {
            warnings.push(
                "Preparation minutes must be greater than zero. Ignoring override.".to_string(),
            );
        } else {
            config.schedule.preparation_minutes = minutes;
        }
    }
}

/// Path to the configuration directory.
pub fn config_directory() -> PathBuf {
    config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(CONFIG_DIR_NAME)
}

/// Path to `config.toml`.
pub fn config_path() -> PathBuf {
    config_directory().join(CONFIG_FILE_NAME)
}

pub fn default_schedule_path() -> PathBuf {
    config_directory()
        .join(SCHEDULES_DIR_NAME)
        .join(DEFAULT_SCHEDULE_FILE)
}

/// Load the configuration from the default location, falling back to defaults.
pub fn load_config() -> ConfigLoadResult {
    load_config_from(&config_path(), Local::now().date_naive())
}

/// Load the configuration at `path`, sanitizing it relative to `today`.
pub fn load_config_from(path: &Path, today: NaiveDate) -> ConfigLoadResult {
    let mut warnings = Vec::new();

    if path.exists() {
        match fs::read_to_string(path) {
            Ok(raw) => match toml::from_str::<FileConfig>(&raw) {
                Ok(cfg) if cfg.schema_version != CURRENT_SCHEMA_VERSION => {
                    warnings.push(format!(
                        "Unknown config schema version {}. Falling back to defaults.",
                        cfg.schema_version
                    ));
                }
                Ok(cfg) => {
                    let (cfg, mut sanitize_warnings) = sanitize_config(cfg, today);
                    warnings.append(&mut sanitize_warnings);
                    return ConfigLoadResult {
                        config: cfg,
                        warnings,
                        source: ConfigSource::File,
                    };
                }
                Err(err) => {
                    warnings.push(format!(
                        "Failed to parse {} as TOML: {}. Falling back to defaults.",
                        CONFIG_FILE_NAME, err
                    ));
                }
            },
            Err(err) => {
                warnings.push(format!(
                    "Failed to read {}: {}. Falling back to defaults.",
                    CONFIG_FILE_NAME, err
                ));
            }
        }
    }

    ConfigLoadResult {
        config: FileConfig::default(),
        warnings,
        source: if path.exists() {
            ConfigSource::Fallback
        } else {
            ConfigSource::Default
        },
    }
}

pub fn save_config_to(path: &Path, config: &FileConfig) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let serialized = toml::to_string_pretty(config)?;
    fs::write(path, serialized)?;
    Ok(())
}

fn sanitize_config(mut config: FileConfig, today: NaiveDate) -> (FileConfig, Vec<String>) {
    let mut warnings = Vec::new();

    if config.schedule.time_offset_seconds.abs() > MAX_TIME_OFFSET_SECONDS {
        warnings.push(format!(
            "schedule.time_offset_seconds {} exceeds {}s. Resetting to 0.",
            config.schedule.time_offset_seconds, MAX_TIME_OFFSET_SECONDS
        ));
        config.schedule.time_offset_seconds = 0;
    }

    if config.schedule.preparation_minutes == 0 {
        warnings.push(format!(
            "schedule.preparation_minutes must be greater than zero. Resetting to {}.",
            DEFAULT_PREPARATION_MINUTES
        ));
        config.schedule.preparation_minutes = DEFAULT_PREPARATION_MINUTES;
    }

    let (mut reschedule, mut reschedule_warnings) =
        RescheduleMap::from_raw(&config.schedule.reschedule_day);
    warnings.append(&mut reschedule_warnings);
    let pruned = reschedule.prune_before(today);
    if pruned > 0 {
        warnings.push(format!(
            "Removed {pruned} outdated reschedule entr{} before {today}.",
            if pruned == 1 { "y" } else { "ies" }
        ));
    }
    config.schedule.reschedule_day = reschedule.to_raw();

    (config, warnings)
}

/// Configuration substructure a change listener subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigSection {
    Schedule,
    Notifications,
}

pub type ConfigListener = Arc<dyn Fn(&FileConfig) + Send + Sync + 'static>;

/// Typed owner of the live configuration with per-section change callbacks.
pub struct ConfigStore {
    config: FileConfig,
    listeners: HashMap<ConfigSection, Vec<ConfigListener>>,
}

impl ConfigStore {
    pub fn new(config: FileConfig) -> Self {
        Self {
            config,
            listeners: HashMap::new(),
        }
    }

    pub fn config(&self) -> &FileConfig {
        &self.config
    }

    pub fn subscribe(&mut self, section: ConfigSection, listener: ConfigListener) {
        self.listeners.entry(section).or_default().push(listener);
    }

    /// Applies `edit` to the schedule settings; listeners run only if something changed.
    pub fn update_schedule(&mut self, edit: impl FnOnce(&mut ScheduleSettings)) -> bool {
        let before = self.config.schedule.clone();
        edit(&mut self.config.schedule);
        let changed = before != self.config.schedule;
        if changed {
            self.notify(ConfigSection::Schedule);
        }
        changed
    }

    pub fn update_notifications(&mut self, edit: impl FnOnce(&mut NotificationSettings)) -> bool {
        let before = self.config.notifications.clone();
        edit(&mut self.config.notifications);
        let changed = before != self.config.notifications;
        if changed {
            self.notify(ConfigSection::Notifications);
        }
        changed
    }

    fn notify(&self, section: ConfigSection) {
        if let Some(listeners) = self.listeners.get(&section) {
            for listener in listeners {
                listener(&self.config);
            }
        }
    }
}
