use std::fmt;

use serde::{Deserialize, Serialize};
use sysinfo::System;

/// Identifying `User-Agent` sent with every fetch.
///
/// Formats as `<app-name>/<version>.<build> (<device-model>; <os-name> <os-version>; <locale>)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAgent {
    pub app_name: String,
    pub version: String,
    #[serde(default)]
    pub build: Option<String>,
    pub device_model: String,
    pub os_name: String,
    pub os_version: String,
    pub locale: String,
}

impl UserAgent {
    /// Fills the device part from the current host.
    pub fn detect(
        app_name: impl Into<String>,
        version: impl Into<String>,
        build: Option<String>,
    ) -> Self {
        Self {
            app_name: app_name.into(),
            version: version.into(),
            build,
            device_model: System::cpu_arch(),
            os_name: System::name().unwrap_or_else(|| std::env::consts::OS.to_string()),
            os_version: System::os_version().unwrap_or_else(|| "unknown".to_string()),
            locale: current_locale(),
        }
    }

    pub fn header_value(&self) -> String {
        self.to_string()
    }
}

impl Default for UserAgent {
    fn default() -> Self {
        Self::detect(env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"), None)
    }
}

impl fmt::Display for UserAgent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.app_name, self.version)?;
        if let Some(build) = &self.build {
            write!(f, ".{build}")?;
        }
        write!(
            f,
            " ({}; {} {}; {})",
            self.device_model, self.os_name, self.os_version, self.locale
        )
    }
}

fn current_locale() -> String {
    ["LC_ALL", "LC_MESSAGES", "LANG"]
        .into_iter()
        .filter_map(|key| std::env::var(key).ok())
        .find_map(|value| parse_locale(&value))
        .unwrap_or_else(|| "en_US".to_string())
}

/// `en_US.UTF-8@euro` -> `en_US`
fn parse_locale(value: &str) -> Option<String> {
    let locale = value.split(['.', '@']).next()?.trim();
    match locale {
        "" | "C" | "POSIX" => None,
        locale => Some(locale.to_string()),
    }
}
