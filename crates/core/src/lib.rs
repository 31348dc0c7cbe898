use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use uuid::Uuid;

pub mod size;

pub use size::{display_value, exact_bytes, format_decimal_gb};

pub const SNAPSHOT_SCHEMA_VERSION: &str = "1.0.0";

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DriveSnapshot {
    pub snapshot_id: Uuid,
    pub schema_version: String,
    pub host: HostInfo,
    pub drives: Vec<Drive>,
    pub generated_at_utc: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct HostInfo {
    pub os: String,        // "macos"
    pub os_version: String,
    pub machine: String,
}

/// Which discovery step produced a drive record.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DriveSource {
    StructuredListing,
    TextListing,
    StorageInventory,
    UsbProtocolScan,
    UsbInventory,
    UsbMountScan,
    MountTable,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Drive {
    pub name: String,
    pub identifier: String,        // dedup key within one snapshot
    pub size: String,              // display string, e.g. "500.1 GB"
    pub size_bytes: Option<u64>,   // only when the source reported an exact count
    #[serde(rename = "type")]
    pub kind: String,
    pub mount_point: String,       // empty when not mounted
    pub is_internal: bool,         // heuristic
    pub is_efi: bool,              // heuristic
    pub device_node: Option<String>,
    pub source: DriveSource,
    pub partitions: Vec<Partition>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Partition {
    pub name: String,
    pub identifier: String,
    pub size: String,
    pub size_bytes: Option<u64>,
    #[serde(rename = "type")]
    pub kind: String,
    pub mount_point: String,
    pub is_efi: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct EfiCandidate {
    pub identifier: String,
    pub name: String,
    pub disk_identifier: String,
    pub mount_point: String,
    pub is_internal: bool,
}

impl Drive {
    /// Blank record with an unknown size; callers fill the rest with struct update syntax.
    pub fn new(identifier: impl Into<String>, name: impl Into<String>, source: DriveSource) -> Self {
        Self {
            name: name.into(),
            identifier: identifier.into(),
            size: "Unknown".to_string(),
            size_bytes: None,
            kind: "Unknown".to_string(),
            mount_point: String::new(),
            is_internal: false,
            is_efi: false,
            device_node: None,
            source,
            partitions: Vec::new(),
        }
    }

    pub fn is_mounted(&self) -> bool {
        !self.mount_point.is_empty()
    }
}

impl DriveSnapshot {
    pub fn new(host: HostInfo, drives: Vec<Drive>) -> Self {
        Self {
            snapshot_id: Uuid::new_v4(),
            schema_version: SNAPSHOT_SCHEMA_VERSION.to_string(),
            host,
            drives,
            generated_at_utc: now_utc_rfc3339(),
        }
    }
}

/// Every drive or partition flagged EFI, in snapshot order.
pub fn efi_candidates(drives: &[Drive]) -> Vec<EfiCandidate> {
    let mut out = Vec::new();
    for drive in drives {
        if drive.is_efi {
            out.push(EfiCandidate {
                identifier: drive.identifier.clone(),
                name: drive.name.clone(),
                disk_identifier: whole_disk(&drive.identifier).to_string(),
                mount_point: drive.mount_point.clone(),
                is_internal: drive.is_internal,
            });
        }
        for partition in drive.partitions.iter().filter(|p| p.is_efi) {
            out.push(EfiCandidate {
                identifier: partition.identifier.clone(),
                name: partition.name.clone(),
                disk_identifier: drive.identifier.clone(),
                mount_point: partition.mount_point.clone(),
                is_internal: drive.is_internal,
            });
        }
    }
    out
}

/// `disk3s1` -> `disk3`. Identifiers that are not `diskN...` come back unchanged.
pub fn whole_disk(identifier: &str) -> &str {
    let Some(rest) = identifier.strip_prefix("disk") else {
        return identifier;
    };
    let digits = rest.bytes().take_while(|b| b.is_ascii_digit()).count();
    if digits == 0 {
        return identifier;
    }
    &identifier[..4 + digits]
}

/// Slice number of a `diskNsM` identifier. Whole disks and nested slices
/// (`disk3s1s1`) have none.
pub fn partition_suffix(identifier: &str) -> Option<u32> {
    let rest = identifier.strip_prefix("disk")?;
    let (disk, slice) = rest.split_once('s')?;
    if !is_number(disk) || !is_number(slice) {
        return None;
    }
    slice.parse().ok()
}

fn is_number(value: &str) -> bool {
    !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit())
}

pub fn now_utc_rfc3339() -> String {
    time::OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}
