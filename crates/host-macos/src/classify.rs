use log::debug;

use crate::info::{mentions_apfs, reports_usb_protocol_any_case};
use crate::mounts::parse_mount_table;
use crate::port::SystemQueryPort;

/// One step of the internal/external decision. `None` defers to the next rule.
pub struct InternalRule {
    pub name: &'static str,
    pub check: fn(&dyn SystemQueryPort, &str) -> Option<bool>,
}

/// Evaluated in order; the first verdict wins. Later rules assume earlier ones
/// were already tried.
pub const INTERNAL_RULES: &[InternalRule] = &[
    InternalRule {
        name: "boot_disk_convention",
        check: boot_disk_convention,
    },
    InternalRule {
        name: "usb_protocol",
        check: usb_protocol,
    },
    InternalRule {
        name: "root_mount",
        check: root_mount,
    },
    InternalRule {
        name: "apfs_content",
        check: apfs_content,
    },
];

pub fn is_disk_internal(port: &dyn SystemQueryPort, identifier: &str) -> bool {
    for rule in INTERNAL_RULES {
        if let Some(verdict) = (rule.check)(port, identifier) {
            debug!("{}: internal={} ({})", identifier, verdict, rule.name);
            return verdict;
        }
    }
    debug!("{}: internal=false (default)", identifier);
    false
}

fn boot_disk_convention(_port: &dyn SystemQueryPort, identifier: &str) -> Option<bool> {
    matches!(identifier, "disk0" | "disk1").then_some(true)
}

fn usb_protocol(port: &dyn SystemQueryPort, identifier: &str) -> Option<bool> {
    let info = port.disk_info(identifier);
    (info.success && reports_usb_protocol_any_case(&info.output)).then_some(false)
}

fn root_mount(port: &dyn SystemQueryPort, identifier: &str) -> Option<bool> {
    let mounts = port.mounted_filesystems();
    if !mounts.success {
        return None;
    }
    let device = format!("/dev/{}", identifier);
    parse_mount_table(&mounts.output)
        .iter()
        .any(|entry| entry.mount_point == "/" && is_same_disk(&entry.device, &device))
        .then_some(true)
}

fn apfs_content(port: &dyn SystemQueryPort, identifier: &str) -> Option<bool> {
    let info = port.disk_info(identifier);
    (info.success && mentions_apfs(&info.output)).then_some(true)
}

/// `/dev/disk3` matches itself and its slices (`/dev/disk3s1s1`), not `/dev/disk30`.
fn is_same_disk(mounted: &str, device: &str) -> bool {
    match mounted.strip_prefix(device) {
        Some("") => true,
        Some(rest) => rest
            .strip_prefix('s')
            .and_then(|slice| slice.chars().next())
            .map(|c| c.is_ascii_digit())
            .unwrap_or(false),
        None => false,
    }
}
