//! Core library crate: timetable model, schedule resolution and the tick-driven runtime.

pub mod config;
pub mod document;
pub mod logging;
pub mod model;
pub mod notify;
pub mod query;
pub mod resolve;
pub mod runtime;
pub mod week;

pub use config::{
    ConfigError, ConfigLoadResult, ConfigSection, ConfigSource, ConfigStore, FileConfig,
    NotificationSettings, ProviderSettings, RuntimeOverrides, ScheduleSettings,
    apply_runtime_overrides, config_directory, config_path, load_config, load_config_from,
    save_config_to,
};
pub use document::{
    DocumentError, default_subjects, load_document, load_document_or_default, parse_document,
    save_document,
};
pub use logging::{LoggingDestination, LoggingError, current_log_path, init_logging};
pub use model::{
    Entry, EntryType, MetaInfo, Override, SCHEDULE_SCHEMA_VERSION, ScheduleDocument, Subject,
    TimeFieldError, Timeline,
};
pub use notify::{
    Notification, NotificationError, NotificationLevel, NotificationProviders, ProviderCategory,
    ProviderInfo,
};
pub use resolve::{DayContext, RescheduleMap, best_override, preview_entry, resolve_day};
pub use runtime::{
    EventListener, RuntimeEvent, RuntimeSettings, RuntimeSnapshot, ScheduleRuntime,
    ScheduleStatus,
};
pub use week::{WeekSpec, cycle_position, week_number};
