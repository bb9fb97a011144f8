use std::{fs, io, path::Path, time::Duration};

use anyhow::Context;
use client_core::{ControllerSettings, MessageTiming};
use serde::Deserialize;

pub const DEFAULT_CONFIG_FILE: &str = "posty.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub server_url: String,
    pub reconcile_delay_ms: u64,
    pub message_fade_in_ms: u64,
    pub message_hold_ms: u64,
    pub message_fade_out_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        let controller = ControllerSettings::default();
        let timing = controller.message_timing;
        Self {
            server_url: "http://127.0.0.1:8080".into(),
            reconcile_delay_ms: millis(controller.reconcile_delay),
            message_fade_in_ms: millis(timing.fade_in),
            message_hold_ms: millis(timing.hold),
            message_fade_out_ms: millis(timing.fade_out),
        }
    }
}

impl Settings {
    pub fn controller_settings(&self) -> ControllerSettings {
        ControllerSettings {
            reconcile_delay: Duration::from_millis(self.reconcile_delay_ms),
            message_timing: MessageTiming {
                fade_in: Duration::from_millis(self.message_fade_in_ms),
                hold: Duration::from_millis(self.message_hold_ms),
                fade_out: Duration::from_millis(self.message_fade_out_ms),
            },
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileSettings {
    server_url: Option<String>,
    reconcile_delay_ms: Option<u64>,
    message_fade_in_ms: Option<u64>,
    message_hold_ms: Option<u64>,
    message_fade_out_ms: Option<u64>,
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Defaults, then the config file, then the environment.
pub fn load_settings(path: Option<&Path>) -> anyhow::Result<Settings> {
    let mut settings = load_file_settings(path)?;
    apply_env(&mut settings, |key| std::env::var(key).ok())?;
    Ok(settings)
}

/// Defaults overlaid with the config file. An explicit `path` must exist; the
/// default file is optional.
fn load_file_settings(path: Option<&Path>) -> anyhow::Result<Settings> {
    let mut settings = Settings::default();

    let (path, required) = match path {
        Some(path) => (path, true),
        None => (Path::new(DEFAULT_CONFIG_FILE), false),
    };
    match fs::read_to_string(path) {
        Ok(raw) => apply_file(&mut settings, &raw)
            .with_context(|| format!("invalid config file '{}'", path.display()))?,
        Err(error) if error.kind() == io::ErrorKind::NotFound && !required => {}
        Err(error) => {
            return Err(error)
                .with_context(|| format!("failed to read config file '{}'", path.display()))
        }
    }

    Ok(settings)
}

fn apply_file(settings: &mut Settings, raw: &str) -> anyhow::Result<()> {
    let file_cfg: FileSettings = toml::from_str(raw)?;

    if let Some(v) = file_cfg.server_url {
        settings.server_url = v;
    }
    if let Some(v) = file_cfg.reconcile_delay_ms {
        settings.reconcile_delay_ms = v;
    }
    if let Some(v) = file_cfg.message_fade_in_ms {
        settings.message_fade_in_ms = v;
    }
    if let Some(v) = file_cfg.message_hold_ms {
        settings.message_hold_ms = v;
    }
    if let Some(v) = file_cfg.message_fade_out_ms {
        settings.message_fade_out_ms = v;
    }
    Ok(())
}

fn apply_env(
    settings: &mut Settings,
    lookup: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<()> {
    if let Some(v) = lookup("POSTY_SERVER_URL") {
        settings.server_url = v;
    }
    if let Some(v) = lookup("APP__SERVER_URL") {
        settings.server_url = v;
    }

    let numeric = [
        ("APP__RECONCILE_DELAY_MS", &mut settings.reconcile_delay_ms),
        ("APP__MESSAGE_FADE_IN_MS", &mut settings.message_fade_in_ms),
        ("APP__MESSAGE_HOLD_MS", &mut settings.message_hold_ms),
        ("APP__MESSAGE_FADE_OUT_MS", &mut settings.message_fade_out_ms),
    ];
    for (key, slot) in numeric {
        if let Some(v) = lookup(key) {
            *slot = v
                .trim()
                .parse()
                .with_context(|| format!("{key} must be a whole number of milliseconds, got '{v}'"))?;
        }
    }

    Ok(())
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
