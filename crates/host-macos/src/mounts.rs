use lazy_static::lazy_static;
use log::debug;
use regex::Regex;
use std::path::Path;
use sysmaint_core::{Drive, DriveSource};

use crate::info::DiskInfo;
use crate::port::SystemQueryPort;

lazy_static! {
    static ref DISK_ID_RE: Regex = Regex::new(r"disk[0-9]+").unwrap();
}

const EXTERNAL_VOLUMES_ROOT: &str = "/Volumes";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountEntry {
    pub device: String,
    pub mount_point: String,
    pub fs_type: Option<String>,
}

/// Parses `mount` output: `/dev/disk3s1 on /Volumes/My Disk (msdos, local, nodev)`.
/// Mount points may contain spaces; the option list is the last parenthesized group.
pub fn parse_mount_table(output: &str) -> Vec<MountEntry> {
    let mut entries = Vec::new();
    for line in output.lines() {
        let Some((device, rest)) = line.split_once(" on ") else {
            continue;
        };
        let (mount_point, fs_type) = match rest.rfind(" (") {
            Some(idx) => {
                let options = rest[idx + 2..].trim_end().trim_end_matches(')');
                let fs_type = options
                    .split(',')
                    .next()
                    .map(|value| value.trim().to_string())
                    .filter(|value| !value.is_empty());
                (&rest[..idx], fs_type)
            }
            None => (rest, None),
        };
        let device = device.trim();
        let mount_point = mount_point.trim();
        if device.is_empty() || mount_point.is_empty() {
            continue;
        }
        entries.push(MountEntry {
            device: device.to_string(),
            mount_point: mount_point.to_string(),
            fs_type,
        });
    }
    entries
}

/// `Size` column of the last `df -h` line.
pub fn parse_df_size(output: &str) -> Option<String> {
    output
        .lines()
        .rev()
        .find(|line| !line.trim().is_empty())
        .and_then(|line| line.split_whitespace().nth(1))
        .map(|value| value.to_string())
}

/// Final path component, or the path itself for `/`.
pub fn last_component(path: &str) -> Option<String> {
    if path.is_empty() {
        return None;
    }
    Path::new(path)
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .or_else(|| Some(path.to_string()))
}

pub fn is_under_external_root(mount_point: &str) -> bool {
    mount_point.starts_with(EXTERNAL_VOLUMES_ROOT) && mount_point != "/"
}

/// Last resort: one record per mounted `/dev/disk...` device.
pub fn mount_table_drives(port: &dyn SystemQueryPort) -> Vec<Drive> {
    let mounts = port.mounted_filesystems();
    if !mounts.success {
        return Vec::new();
    }

    let mut drives = Vec::new();
    let mut volume_count = 0;
    for entry in parse_mount_table(&mounts.output) {
        if !entry.device.starts_with("/dev/disk") {
            continue;
        }
        let Some(disk_id) = DISK_ID_RE.find(&entry.device) else {
            continue;
        };
        let mount_point = entry.mount_point.clone();
        let name = last_component(&mount_point).unwrap_or_else(|| format!("Volume {}", volume_count));

        let free = port.free_space(&mount_point);
        let size = if free.success {
            parse_df_size(&free.output).unwrap_or_else(|| "Unknown".to_string())
        } else {
            "Unknown".to_string()
        };

        let info = port.disk_info(&entry.device);
        let kind = if info.success {
            DiskInfo::parse(&info.output).bundle_type
        } else {
            None
        };

        debug!("mount table: {} on {}", entry.device, mount_point);
        let is_internal = !is_under_external_root(&mount_point);
        let is_efi = mount_point.contains("EFI") || name.contains("EFI");
        drives.push(Drive {
            size,
            kind: kind.unwrap_or_else(|| "Unknown".to_string()),
            mount_point,
            is_internal,
            is_efi,
            ..Drive::new(disk_id.as_str(), name, DriveSource::MountTable)
        });
        volume_count += 1;
    }
    drives
}
