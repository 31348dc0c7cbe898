use std::collections::HashMap;
use sysmaint_core::{display_value, exact_bytes, Drive, DriveSource};

use crate::mounts::{is_under_external_root, last_component};
use crate::port::SystemQueryPort;

pub type Block = HashMap<String, String>;

/// Groups `Key: Value` lines into blocks. A blank line or a `--` line closes
/// the current block; the last one is closed at end of input. Lines with more
/// than one colon are skipped.
pub fn key_value_blocks(output: &str) -> Vec<Block> {
    let mut blocks = Vec::new();
    let mut current = Block::new();
    for line in output.lines() {
        let trimmed = line.trim();
        if trimmed.contains(':') {
            let parts: Vec<&str> = trimmed.split(':').collect();
            if parts.len() == 2 {
                current.insert(parts[0].trim().to_string(), parts[1].trim().to_string());
            }
        } else if trimmed.is_empty() || trimmed.contains("--") {
            if !current.is_empty() {
                blocks.push(std::mem::take(&mut current));
            }
        }
    }
    if !current.is_empty() {
        blocks.push(current);
    }
    blocks
}

pub fn non_empty<'a>(block: &'a Block, key: &str) -> Option<&'a str> {
    block.get(key).map(|v| v.as_str()).filter(|v| !v.is_empty())
}

/// Drives from the storage hardware inventory; tried when both listings came back empty.
pub fn storage_inventory_drives(port: &dyn SystemQueryPort) -> Vec<Drive> {
    let inventory = port.storage_inventory();
    if !inventory.success {
        return Vec::new();
    }

    let mut drives = Vec::new();
    for block in key_value_blocks(&inventory.output) {
        let mount_point = non_empty(&block, "Mount Point").unwrap_or("").to_string();
        let name = last_component(&mount_point)
            .or_else(|| non_empty(&block, "Volume Name").map(str::to_string))
            .or_else(|| non_empty(&block, "Device Name").map(str::to_string));
        let Some(name) = name else {
            continue;
        };
        let capacity = non_empty(&block, "Capacity").or_else(|| non_empty(&block, "Size"));
        let identifier = non_empty(&block, "BSD Name")
            .map(str::to_string)
            .unwrap_or_else(|| format!("disk{}", drives.len()));

        drives.push(Drive {
            size: capacity.map(display_value).unwrap_or_else(|| "Unknown".to_string()),
            size_bytes: capacity.and_then(exact_bytes),
            kind: non_empty(&block, "File System").unwrap_or("Unknown").to_string(),
            is_internal: !is_under_external_root(&mount_point),
            mount_point,
            ..Drive::new(identifier, name, DriveSource::StorageInventory)
        });
    }
    drives
}
