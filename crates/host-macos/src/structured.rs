use anyhow::{Context, Result};
use log::{debug, warn};
use serde::Deserialize;
use sysmaint_core::{format_decimal_gb, Drive, DriveSource, Partition};

use crate::classify::is_disk_internal;
use crate::info::DiskInfo;
use crate::port::SystemQueryPort;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DiskutilList {
    #[serde(default)]
    all_disks_and_partitions: Vec<ListedDisk>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListedDisk {
    device_identifier: Option<String>,
    size: Option<u64>,
    #[serde(rename = "APFSVolumes")]
    apfs_volumes: Option<Vec<ListedVolume>>,
    partitions: Option<Vec<ListedPartition>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListedVolume {
    device_identifier: Option<String>,
    mount_point: Option<String>,
    volume_name: Option<String>,
    size: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListedPartition {
    device_identifier: Option<String>,
    size: Option<u64>,
    content: Option<String>,
    mount_point: Option<String>,
    volume_name: Option<String>,
}

/// Drives from `diskutil list -plist`. Anything unreadable yields no drives.
pub fn structured_drives(port: &dyn SystemQueryPort) -> Vec<Drive> {
    let listing = port.list_disks_plist();
    if !listing.success {
        debug!("structured listing unavailable");
        return Vec::new();
    }
    match parse_listing(listing.output.as_bytes()) {
        Ok(disks) => disks_to_drives(port, disks),
        Err(err) => {
            warn!("structured listing unreadable: {:#}", err);
            Vec::new()
        }
    }
}

fn parse_listing(data: &[u8]) -> Result<Vec<ListedDisk>> {
    let list: DiskutilList = plist::from_bytes(data).context("decode diskutil plist")?;
    Ok(list.all_disks_and_partitions)
}

fn disks_to_drives(port: &dyn SystemQueryPort, disks: Vec<ListedDisk>) -> Vec<Drive> {
    let mut drives = Vec::new();
    for disk in disks {
        let Some(identifier) = disk.device_identifier else {
            continue;
        };
        let size_bytes = disk.size.filter(|bytes| *bytes > 0);

        if let Some(volumes) = disk.apfs_volumes {
            let is_internal = is_disk_internal(port, &identifier);
            drives.push(Drive {
                size: format_decimal_gb(disk.size.unwrap_or(0)),
                size_bytes,
                kind: "APFS Container".to_string(),
                is_internal,
                ..Drive::new(
                    identifier.as_str(),
                    format!("APFS Container ({})", identifier),
                    DriveSource::StructuredListing,
                )
            });
            for volume in volumes {
                let (Some(vol_id), Some(mount_point), Some(vol_name)) =
                    (volume.device_identifier, volume.mount_point, volume.volume_name)
                else {
                    continue;
                };
                drives.push(Drive {
                    size: "APFS Volume".to_string(),
                    size_bytes: volume.size.filter(|bytes| *bytes > 0),
                    kind: "APFS".to_string(),
                    mount_point,
                    is_internal,
                    ..Drive::new(vol_id, vol_name, DriveSource::StructuredListing)
                });
            }
        } else if let Some(partitions) = disk.partitions {
            let is_internal = is_disk_internal(port, &identifier);
            let info_output = port.disk_info(&identifier);
            let info = DiskInfo::parse(&info_output.output);

            let name = info
                .media_name
                .clone()
                .unwrap_or_else(|| format!("Disk ({})", identifier));
            drives.push(Drive {
                size: format_decimal_gb(disk.size.unwrap_or(0)),
                size_bytes,
                kind: info.transport_label(),
                is_internal,
                device_node: info.device_node.clone(),
                partitions: partitions.into_iter().filter_map(to_partition).collect(),
                ..Drive::new(identifier.as_str(), name, DriveSource::StructuredListing)
            });
        }
    }
    drives
}

fn to_partition(partition: ListedPartition) -> Option<Partition> {
    let identifier = partition.device_identifier?;
    let size = partition.size?;
    let content = partition.content?;
    let name = partition.volume_name.unwrap_or_else(|| "Unnamed".to_string());
    let is_efi = content.contains("EFI") || name.contains("EFI");
    Some(Partition {
        name,
        identifier,
        size: format_decimal_gb(size),
        size_bytes: (size > 0).then_some(size),
        kind: content,
        mount_point: partition.mount_point.unwrap_or_default(),
        is_efi,
    })
}
