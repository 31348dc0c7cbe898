use lazy_static::lazy_static;
use log::debug;
use regex::Regex;
use std::collections::HashSet;
use sysmaint_core::{display_value, exact_bytes, partition_suffix, Drive, DriveSource};

use crate::info::{reports_usb_protocol, DiskInfo};
use crate::inventory::{key_value_blocks, non_empty};
use crate::mounts::{last_component, parse_mount_table};
use crate::port::SystemQueryPort;
use crate::text_listing::header_identifiers;

lazy_static! {
    static ref INVENTORY_KEY_RE: Regex =
        Regex::new(r"Product ID|Vendor ID|Manufacturer|Product|Serial Number|Capacity").unwrap();
    static ref SLICED_DEVICE_RE: Regex = Regex::new(r"^/dev/disk.*s[0-9]").unwrap();
    static ref TRAILING_SLICE_RE: Regex = Regex::new(r"s[0-9]+$").unwrap();
}

const CONTEXT_BEFORE: usize = 2;
const CONTEXT_AFTER: usize = 10;

/// Reduces `system_profiler SPUSBDataType` output to the lines around each
/// `Mass Storage` entry that carry identifying keys. Separate entries are
/// divided by `--` lines, and leading spaces are stripped.
pub fn mass_storage_excerpt(raw: &str) -> String {
    let lines: Vec<&str> = raw.lines().collect();
    let mut windows: Vec<(usize, usize)> = Vec::new();
    for (idx, line) in lines.iter().enumerate() {
        if !line.contains("Mass Storage") {
            continue;
        }
        let start = idx.saturating_sub(CONTEXT_BEFORE);
        let end = (idx + CONTEXT_AFTER).min(lines.len().saturating_sub(1));
        match windows.last_mut() {
            Some(last) if start <= last.1 + 1 => last.1 = last.1.max(end),
            _ => windows.push((start, end)),
        }
    }

    let mut out = Vec::new();
    for (n, (start, end)) in windows.into_iter().enumerate() {
        if n > 0 {
            out.push("--".to_string());
        }
        for line in &lines[start..=end] {
            if INVENTORY_KEY_RE.is_match(line) {
                out.push(line.trim_start_matches(' ').to_string());
            }
        }
    }
    out.join("\n")
}

/// Runs all three USB probes and returns what they found, in probe order.
/// The mounted-volume probe skips identifiers already in `existing` or found earlier.
pub fn enhanced_usb_drives(port: &dyn SystemQueryPort, existing: &[Drive]) -> Vec<Drive> {
    let mut found = usb_protocol_scan(port);
    found.extend(usb_inventory_drives(port));

    let mut known: HashSet<String> = existing
        .iter()
        .chain(found.iter())
        .map(|drive| drive.identifier.clone())
        .collect();
    let mounted = mounted_usb_drives(port, &mut known);
    found.extend(mounted);

    debug!("usb detection found {} record(s)", found.len());
    found
}

/// Whole disks from the text listing whose info reports a USB protocol.
pub fn usb_protocol_scan(port: &dyn SystemQueryPort) -> Vec<Drive> {
    let listing = port.list_disks_text();
    if !listing.success {
        return Vec::new();
    }

    let mut drives = Vec::new();
    for identifier in header_identifiers(&listing.output) {
        let info_output = port.disk_info(&identifier);
        if !info_output.success || !reports_usb_protocol(&info_output.output) {
            continue;
        }
        let info = DiskInfo::parse(&info_output.output);
        let name = info
            .media_name
            .clone()
            .or_else(|| info.volume_name.clone())
            .unwrap_or_else(|| "Unknown".to_string());
        let bundle = info.bundle_type.as_deref().unwrap_or("");
        let is_efi =
            partition_suffix(&identifier) == Some(1) && (name.contains("EFI") || bundle.contains("EFI"));

        debug!("usb protocol scan: {}", identifier);
        drives.push(Drive {
            size: info.size.clone().unwrap_or_else(|| "Unknown".to_string()),
            size_bytes: info.size_bytes,
            kind: format!("USB ({})", info.protocol.as_deref().unwrap_or("Unknown")),
            mount_point: info.mount_point.clone().unwrap_or_default(),
            is_efi,
            device_node: info.device_node.clone(),
            ..Drive::new(identifier.as_str(), name, DriveSource::UsbProtocolScan)
        });
    }
    drives
}

/// Synthetic `usbN` records from the USB hardware inventory. These never
/// claim a `diskN` identifier, so the mounted-volume probe can still record
/// the real disk.
pub fn usb_inventory_drives(port: &dyn SystemQueryPort) -> Vec<Drive> {
    let inventory = port.usb_storage_devices();
    if !inventory.has_output() {
        return Vec::new();
    }

    let mut drives = Vec::new();
    for (counter, block) in key_value_blocks(&inventory.output).iter().enumerate() {
        let name = non_empty(block, "Product")
            .or_else(|| non_empty(block, "Manufacturer"))
            .unwrap_or("USB Drive");
        let capacity = non_empty(block, "Capacity");
        drives.push(Drive {
            size: capacity.map(display_value).unwrap_or_else(|| "Unknown".to_string()),
            size_bytes: capacity.and_then(exact_bytes),
            kind: "USB Storage".to_string(),
            ..Drive::new(format!("usb{}", counter), name, DriveSource::UsbInventory)
        });
    }
    drives
}

/// Mounted slices whose parent disk reports a USB protocol.
pub fn mounted_usb_drives(port: &dyn SystemQueryPort, known: &mut HashSet<String>) -> Vec<Drive> {
    let mounts = port.mounted_filesystems();
    if !mounts.success {
        return Vec::new();
    }

    let mut drives = Vec::new();
    for entry in parse_mount_table(&mounts.output) {
        if !SLICED_DEVICE_RE.is_match(&entry.device) {
            continue;
        }
        let device = entry.device.trim_start_matches("/dev/");
        let disk = TRAILING_SLICE_RE.replace(device, "").to_string();
        if known.contains(&disk) {
            continue;
        }
        let info = port.disk_info(&disk);
        if !info.success || !reports_usb_protocol(&info.output) {
            continue;
        }

        debug!("mounted usb volume: {} on {}", disk, entry.mount_point);
        let name = last_component(&entry.mount_point).unwrap_or_else(|| disk.clone());
        known.insert(disk.clone());
        drives.push(Drive {
            size: "Mounted".to_string(),
            kind: "USB (Mounted)".to_string(),
            is_efi: entry.mount_point.contains("EFI"),
            mount_point: entry.mount_point,
            ..Drive::new(disk, name, DriveSource::UsbMountScan)
        });
    }
    drives
}
