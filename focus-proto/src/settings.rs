//! Per-owner timer and notification preferences.

use serde::{Deserialize, Serialize};

/// Default focus length in minutes.
pub const DEFAULT_POMODORO_MINUTES: u32 = 25;
/// Default short break in minutes.
pub const DEFAULT_SHORT_BREAK_MINUTES: u32 = 5;
/// Default long break in minutes.
pub const DEFAULT_LONG_BREAK_MINUTES: u32 = 15;

/// Stored settings for one owner. Created lazily with defaults on first read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSettings {
    /// Focus session length in minutes.
    pub default_pomodoro: u32,
    /// Short break length in minutes.
    pub short_break: u32,
    /// Long break length in minutes.
    pub long_break: u32,
    /// Play a sound when a timer ends.
    pub sound_enabled: bool,
    /// Show a notification when a timer ends.
    pub notify_enabled: bool,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            default_pomodoro: DEFAULT_POMODORO_MINUTES,
            short_break: DEFAULT_SHORT_BREAK_MINUTES,
            long_break: DEFAULT_LONG_BREAK_MINUTES,
            sound_enabled: true,
            notify_enabled: true,
        }
    }
}

/// Partial settings update; absent fields keep their current value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_pomodoro: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short_break: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub long_break: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sound_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notify_enabled: Option<bool>,
}

impl SettingsPatch {
    /// Returns `true` if any duration in the patch is zero.
    #[must_use]
    pub fn has_zero_duration(&self) -> bool {
        [self.default_pomodoro, self.short_break, self.long_break]
            .into_iter()
            .flatten()
            .any(|minutes| minutes == 0)
    }

    /// Returns `settings` with the present fields replaced.
    #[must_use]
    pub fn applied_to(&self, settings: UserSettings) -> UserSettings {
        UserSettings {
            default_pomodoro: self.default_pomodoro.unwrap_or(settings.default_pomodoro),
            short_break: self.short_break.unwrap_or(settings.short_break),
            long_break: self.long_break.unwrap_or(settings.long_break),
            sound_enabled: self.sound_enabled.unwrap_or(settings.sound_enabled),
            notify_enabled: self.notify_enabled.unwrap_or(settings.notify_enabled),
        }
    }
}
