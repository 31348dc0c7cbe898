mod classify;
mod config;
mod discovery;
mod info;
mod inventory;
mod mounts;
mod port;
mod runner;
mod structured;
mod text_listing;
mod usb;

#[cfg(test)]
mod mock;

use anyhow::Result;
use sysmaint_core::DriveSnapshot;

pub use classify::{is_disk_internal, InternalRule, INTERNAL_RULES};
pub use config::{DiscoveryConfig, DEFAULT_COMMAND_TIMEOUT, SKIP_USB_SCAN_ENV, TIMEOUT_ENV};
pub use discovery::{dedup_by_identifier, order_drives, DriveDiscovery};
pub use info::DiskInfo;
pub use mounts::{parse_mount_table, MountEntry};
pub use port::{CommandOutput, MacosSystem, SystemQueryPort};
pub use runner::CommandRunner;
pub use usb::mass_storage_excerpt;

/// Discovery bound to the live system tools.
pub fn system_discovery(config: DiscoveryConfig) -> Result<DriveDiscovery<MacosSystem>> {
    #[cfg(target_os = "macos")]
    {
        let port = MacosSystem::new(&config);
        Ok(DriveDiscovery::new(port, config))
    }

    #[cfg(not(target_os = "macos"))]
    {
        let _ = config;
        Err(anyhow::anyhow!("sysmaint-host-macos requires macOS"))
    }
}

pub fn build_drive_snapshot(config: &DiscoveryConfig) -> Result<DriveSnapshot> {
    Ok(system_discovery(config.clone())?.snapshot())
}
