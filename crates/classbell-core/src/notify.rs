//! Notification payloads and routing for schedule status changes.
//!
//! The engine never looks providers up globally: the host owns a [`NotificationProviders`]
//! map and hands it to the runtime. A category with no enabled provider is not delivered.

use serde::Serialize;
use std::collections::HashMap;
use thiserror::Error;

use crate::model::{Entry, Subject};
use crate::query::find_subject;
use crate::runtime::ScheduleStatus;

pub const DEFAULT_DURATION_MS: u32 = 5_000;

/// Delivery channel a notification is routed through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderCategory {
    Class,
    Activity,
    BreakOrPreparation,
    Free,
    PreparationBell,
    Fallback,
}

impl ProviderCategory {
    pub const ALL: [ProviderCategory; 6] = [
        ProviderCategory::Class,
        ProviderCategory::Activity,
        ProviderCategory::BreakOrPreparation,
        ProviderCategory::Free,
        ProviderCategory::PreparationBell,
        ProviderCategory::Fallback,
    ];

    pub fn default_provider_id(&self) -> &'static str {
        match self {
            ProviderCategory::Class => "com.classbell.schedule.runtime.class",
            ProviderCategory::Activity => "com.classbell.schedule.runtime.activity",
            ProviderCategory::BreakOrPreparation => "com.classbell.schedule.runtime.break",
            ProviderCategory::Free => "com.classbell.schedule.runtime.free",
            ProviderCategory::PreparationBell => "com.classbell.schedule.runtime.preparation",
            ProviderCategory::Fallback => "com.classbell.schedule.runtime.fallback",
        }
    }

    pub fn default_name(&self) -> &'static str {
        match self {
            ProviderCategory::Class => "Class Notifications",
            ProviderCategory::Activity => "Activity Notifications",
            ProviderCategory::BreakOrPreparation => "Break Notifications",
            ProviderCategory::Free => "Free Time Notifications",
            ProviderCategory::PreparationBell => "Preparation Bell",
            ProviderCategory::Fallback => "Status Notifications",
        }
    }

    /// Channel used for a status transition into `status`.
    pub fn for_status(status: ScheduleStatus) -> Self {
        match status {
            ScheduleStatus::Class => ProviderCategory::Class,
            ScheduleStatus::Activity => ProviderCategory::Activity,
            ScheduleStatus::Break | ScheduleStatus::Preparation => {
                ProviderCategory::BreakOrPreparation
            }
            ScheduleStatus::Free => ProviderCategory::Free,
            ScheduleStatus::Idle => ProviderCategory::Fallback,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum NotificationLevel {
    Info,
    Announcement,
}

/// A provider registered by the host for one category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderInfo {
    pub id: String,
    pub name: String,
    pub enabled: bool,
}

/// Host-owned mapping from category to delivery provider.
#[derive(Debug, Clone)]
pub struct NotificationProviders {
    enabled: bool,
    providers: HashMap<ProviderCategory, ProviderInfo>,
}

impl Default for NotificationProviders {
    fn default() -> Self {
        let providers = ProviderCategory::ALL
            .iter()
            .map(|category| {
                (
                    *category,
                    ProviderInfo {
                        id: category.default_provider_id().to_string(),
                        name: category.default_name().to_string(),
                        enabled: true,
                    },
                )
            })
            .collect();
        Self {
            enabled: true,
            providers,
        }
    }
}

impl NotificationProviders {
    /// A registry with no providers; nothing is delivered until some are registered.
    pub fn empty() -> Self {
        Self {
            enabled: true,
            providers: HashMap::new(),
        }
    }

    pub fn register(&mut self, category: ProviderCategory, provider: ProviderInfo) {
        self.providers.insert(category, provider);
    }

    pub fn unregister(&mut self, category: ProviderCategory) -> Option<ProviderInfo> {
        self.providers.remove(&category)
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Enables or disables the provider with `provider_id`. Returns false if unknown.
    pub fn set_provider_enabled(&mut self, provider_id: &str, enabled: bool) -> bool {
        match self
            .providers
            .values_mut()
            .find(|provider| provider.id == provider_id)
        {
            Some(provider) => {
                provider.enabled = enabled;
                true
            }
            None => false,
        }
    }

    /// The provider that should deliver `category`, if delivery is allowed at all.
    pub fn route(&self, category: ProviderCategory) -> Option<&ProviderInfo> {
        if !self.enabled {
            return None;
        }
        self.providers
            .get(&category)
            .filter(|provider| provider.enabled)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ProviderCategory, &ProviderInfo)> {
        self.providers.iter()
    }
}

/// A fully composed notification, ready for a dispatcher.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub provider_id: String,
    pub category: ProviderCategory,
    pub level: NotificationLevel,
    pub title: String,
    pub message: Option<String>,
    pub duration_ms: u32,
    pub closable: bool,
}

/// Title and optional body before routing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationContent {
    pub category: ProviderCategory,
    pub level: NotificationLevel,
    pub title: String,
    pub message: Option<String>,
}

impl NotificationContent {
    pub fn into_notification(self, provider: &ProviderInfo) -> Notification {
        Notification {
            provider_id: provider.id.clone(),
            category: self.category,
            level: self.level,
            title: self.title,
            message: self.message,
            duration_ms: DEFAULT_DURATION_MS,
            closable: true,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NotificationError {
    #[error("entry '{entry}' references unknown subject '{subject}' and has no title")]
    UnknownSubject { entry: String, subject: String },
}

/// Everything message composition may look at.
pub struct TransitionContext<'a> {
    pub status: ScheduleStatus,
    pub current_entry: Option<&'a Entry>,
    pub current_subject: Option<&'a Subject>,
    pub next_entry: Option<&'a Entry>,
    pub subjects: &'a [Subject],
}

/// Content for a status transition, following the per-status wording rules.
pub fn compose_transition(
    ctx: &TransitionContext<'_>,
) -> Result<NotificationContent, NotificationError> {
    let (title, message) = match ctx.status {
        ScheduleStatus::Class => ("Class Started".to_string(), class_message(ctx)),
        ScheduleStatus::Activity => (
            "Activity Started".to_string(),
            ctx.current_entry
                .and_then(Entry::display_title)
                .map(str::to_string),
        ),
        ScheduleStatus::Preparation => match ctx.next_entry {
            Some(next) => (
                "Intermission".to_string(),
                upcoming_message("Next", next, ctx.subjects)?,
            ),
            None => status_changed(ctx.status),
        },
        ScheduleStatus::Break => {
            let message = match ctx.next_entry {
                Some(next) => upcoming_message("Next", next, ctx.subjects)?,
                None => Some("Enjoy your break".to_string()),
            };
            ("Recess".to_string(), message)
        }
        ScheduleStatus::Free => ("Free Time".to_string(), None),
        ScheduleStatus::Idle => status_changed(ctx.status),
    };

    let level = match ctx.status {
        ScheduleStatus::Idle => NotificationLevel::Info,
        _ => NotificationLevel::Announcement,
    };

    Ok(NotificationContent {
        category: ProviderCategory::for_status(ctx.status),
        level,
        title,
        message,
    })
}

/// Content for the advance bell announcing `next`.
pub fn compose_preparation_bell(
    next: &Entry,
    subjects: &[Subject],
) -> Result<NotificationContent, NotificationError> {
    Ok(NotificationContent {
        category: ProviderCategory::PreparationBell,
        level: NotificationLevel::Announcement,
        title: "Preparation Bell".to_string(),
        message: upcoming_message("Coming up", next, subjects)?,
    })
}

fn status_changed(status: ScheduleStatus) -> (String, Option<String>) {
    (
        "Status Changed".to_string(),
        Some(format!("Current status: {status}")),
    )
}

fn class_message(ctx: &TransitionContext<'_>) -> Option<String> {
    if let Some(title) = ctx.current_entry.and_then(Entry::display_title) {
        return Some(title.to_string());
    }
    let subject = ctx.current_subject?;
    if subject.name.is_empty() {
        return None;
    }
    match subject.teacher.as_deref().filter(|teacher| !teacher.is_empty()) {
        Some(teacher) => Some(format!("{} — {}", subject.name, teacher)),
        None => Some(subject.name.clone()),
    }
}

/// "Next: Math", "Next: PE at Gym", "Next: PE (Off-site)" or "Next: {title}".
///
/// A dangling subject reference is only an error when there is no title to fall back on.
fn upcoming_message(
    prefix: &str,
    next: &Entry,
    subjects: &[Subject],
) -> Result<Option<String>, NotificationError> {
    let subject_id = next.subject_id.as_deref().filter(|id| !id.is_empty());
    let subject = subject_id.and_then(|id| find_subject(subjects, id));
    if let (Some(id), None, None) = (subject_id, subject, next.display_title()) {
        return Err(NotificationError::UnknownSubject {
            entry: next.id.clone(),
            subject: id.to_string(),
        });
    }
    Ok(match subject {
        Some(subject) if subject.is_local_classroom => {
            Some(format!("{prefix}: {}", subject.name))
        }
        Some(subject) => match subject.location.as_deref().filter(|loc| !loc.is_empty()) {
            Some(location) => Some(format!("{prefix}: {} at {location}", subject.name)),
            None => Some(format!("{prefix}: {} (Off-site)", subject.name)),
        },
        None => next
            .display_title()
            .map(|title| format!("{prefix}: {title}")),
    })
}
