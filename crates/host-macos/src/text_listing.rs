use lazy_static::lazy_static;
use regex::Regex;
use std::collections::BTreeSet;
use sysmaint_core::{Drive, DriveSource, Partition};

use crate::classify::is_disk_internal;
use crate::port::SystemQueryPort;

lazy_static! {
    static ref DISK_ID_RE: Regex = Regex::new(r"disk[0-9]+").unwrap();
    static ref HEADER_SIZE_RE: Regex = Regex::new(r"[0-9]+\.[0-9]+ [GT]B").unwrap();
    static ref PARTITION_LINE_RE: Regex = Regex::new(r"^\s*\d+:\s").unwrap();
    static ref SLICE_ID_RE: Regex = Regex::new(r"disk[0-9]+s[0-9]+").unwrap();
}

/// One `/dev/diskN (...):` section of `diskutil list` text output.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListedDisk {
    pub identifier: String,
    pub name: String,
    pub size: String,
    pub is_usb: bool,
    pub partitions: Vec<Partition>,
}

pub fn parse_disk_sections(output: &str) -> Vec<ListedDisk> {
    let mut disks = Vec::new();
    let mut current: Option<ListedDisk> = None;
    let mut in_section = false;

    for line in output.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with("/dev/disk") && trimmed.contains(':') {
            disks.extend(current.take().filter(|disk| !disk.identifier.is_empty()));
            current = Some(parse_header(trimmed));
            in_section = true;
        } else if in_section && (trimmed.starts_with("0:") || PARTITION_LINE_RE.is_match(trimmed)) {
            if let (Some(disk), Some(partition)) = (current.as_mut(), parse_partition_line(trimmed)) {
                disk.partitions.push(partition);
            }
        } else if trimmed.is_empty() && in_section {
            in_section = false;
        }
    }
    disks.extend(current.filter(|disk| !disk.identifier.is_empty()));
    disks
}

fn parse_header(line: &str) -> ListedDisk {
    let mut pieces = line.split(':');
    let device = pieces.next().unwrap_or("").trim();
    let description = pieces.next().unwrap_or("").trim();
    let lowered = line.to_lowercase();

    ListedDisk {
        identifier: DISK_ID_RE
            .find(device)
            .map(|m| m.as_str().to_string())
            .unwrap_or_default(),
        name: description.split(',').next().unwrap_or("").trim().to_string(),
        size: HEADER_SIZE_RE
            .find(line)
            .map(|m| m.as_str().to_string())
            .unwrap_or_else(|| "Unknown".to_string()),
        is_usb: lowered.contains("external") || lowered.contains("usb") || lowered.contains("removable"),
        partitions: Vec::new(),
    }
}

/// `<index>: <identifier> <name> <size> <unit> <type...>`, at least five fields.
fn parse_partition_line(line: &str) -> Option<Partition> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < 5 {
        return None;
    }
    let identifier = fields[1].replace('*', "");
    let name = fields[2].to_string();
    let size = format!("{} {}", fields[3], fields[4]);
    let kind = fields[5..].join(" ");
    let is_efi = kind.contains("EFI")
        || identifier.contains("EFI")
        || name.contains("EFI")
        || identifier.contains("s1");
    Some(Partition {
        name,
        identifier,
        size,
        size_bytes: None,
        kind,
        mount_point: String::new(),
        is_efi,
    })
}

/// Drives from `diskutil list`; used only when the structured listing found nothing.
pub fn text_drives(port: &dyn SystemQueryPort) -> Vec<Drive> {
    let listing = port.list_disks_text();
    if !listing.success {
        return Vec::new();
    }
    parse_disk_sections(&listing.output)
        .into_iter()
        .map(|disk| {
            let is_internal = !disk.is_usb && is_disk_internal(port, &disk.identifier);
            let name = if disk.name.is_empty() {
                format!("Disk {}", disk.identifier)
            } else {
                disk.name
            };
            Drive {
                size: disk.size,
                kind: if disk.is_usb { "USB Drive" } else { "Disk" }.to_string(),
                is_internal,
                partitions: disk.partitions,
                ..Drive::new(disk.identifier, name, DriveSource::TextListing)
            }
        })
        .collect()
}

/// Whole-disk identifiers from the `/dev/diskN` header lines.
pub fn header_identifiers(output: &str) -> Vec<String> {
    output
        .lines()
        .filter(|line| line.starts_with("/dev/disk"))
        .filter_map(|line| line.split_whitespace().next())
        .map(|device| device.trim_end_matches(':').trim_start_matches("/dev/").to_string())
        .collect()
}

/// Every `diskNsM` token in the listing, sorted and unique.
pub fn partition_identifiers(output: &str) -> Vec<String> {
    SLICE_ID_RE
        .find_iter(output)
        .map(|m| m.as_str().to_string())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
