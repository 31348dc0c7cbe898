use log::warn;
use std::time::Duration;

pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(15);
pub const TIMEOUT_ENV: &str = "SYSMAINT_COMMAND_TIMEOUT_SECS";
pub const SKIP_USB_SCAN_ENV: &str = "SYSMAINT_SKIP_USB_SCAN";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryConfig {
    /// Upper bound for every external query.
    pub command_timeout: Duration,
    /// Run the USB-specific detection step. On by default, where it appends to
    /// every discovery; turning it off departs from that cascade and can drop
    /// USB sticks the listings miss.
    pub usb_scan: bool,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            usb_scan: true,
        }
    }
}

impl DiscoveryConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        if secs == 0 {
            warn!("ignoring zero command timeout");
        } else {
            self.command_timeout = Duration::from_secs(secs);
        }
        self
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(raw) = lookup(TIMEOUT_ENV) {
            match raw.trim().parse::<u64>() {
                Ok(secs) => config = config.with_timeout_secs(secs),
                Err(_) => warn!("{}={:?} is not a number of seconds", TIMEOUT_ENV, raw),
            }
        }
        if let Some(raw) = lookup(SKIP_USB_SCAN_ENV) {
            config.usb_scan = !is_truthy(&raw);
        }
        config
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
