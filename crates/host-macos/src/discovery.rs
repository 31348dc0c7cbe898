use log::{debug, info};
use std::collections::HashSet;
use sysmaint_core::{Drive, DriveSnapshot, HostInfo};

use crate::config::DiscoveryConfig;
use crate::inventory::storage_inventory_drives;
use crate::mounts::mount_table_drives;
use crate::port::{CommandOutput, SystemQueryPort};
use crate::structured::structured_drives;
use crate::text_listing::{partition_identifiers, text_drives};
use crate::usb::enhanced_usb_drives;

/// Drive discovery over an injected system port. Every call re-queries the
/// system and returns an independent snapshot.
pub struct DriveDiscovery<P> {
    port: P,
    config: DiscoveryConfig,
}

impl<P: SystemQueryPort> DriveDiscovery<P> {
    pub fn new(port: P, config: DiscoveryConfig) -> Self {
        Self { port, config }
    }

    pub fn port(&self) -> &P {
        &self.port
    }

    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    /// Deduplicated, internal-first list of drives. Never fails; an empty list
    /// means no source produced anything.
    pub fn discover_drives(&self) -> Vec<Drive> {
        let port: &dyn SystemQueryPort = &self.port;

        let mut drives = structured_drives(port);
        debug!("structured listing: {} drive(s)", drives.len());

        if drives.is_empty() {
            drives = text_drives(port);
            debug!("text listing: {} drive(s)", drives.len());
        }

        if drives.is_empty() {
            drives = storage_inventory_drives(port);
            debug!("storage inventory: {} drive(s)", drives.len());
        }

        // USB probes always run and append, whatever the listings found,
        // unless the operator opted out.
        if self.config.usb_scan {
            let usb = enhanced_usb_drives(port, &drives);
            drives.extend(usb);
        }

        if drives.is_empty() {
            drives = mount_table_drives(port);
            debug!("mount table: {} drive(s)", drives.len());
        }

        let mut drives = dedup_by_identifier(drives);
        order_drives(&mut drives);
        info!("discovered {} drive(s)", drives.len());
        drives
    }

    pub fn list_partition_identifiers(&self) -> Vec<String> {
        let listing = self.port.list_disks_text();
        if !listing.success {
            return Vec::new();
        }
        partition_identifiers(&listing.output)
    }

    pub fn host_info(&self) -> HostInfo {
        HostInfo {
            os: "macos".to_string(),
            os_version: first_line_or_unknown(self.port.product_version()),
            machine: first_line_or_unknown(self.port.hardware_model()),
        }
    }

    pub fn snapshot(&self) -> DriveSnapshot {
        DriveSnapshot::new(self.host_info(), self.discover_drives())
    }
}

fn first_line_or_unknown(result: CommandOutput) -> String {
    if !result.has_output() {
        return "unknown".to_string();
    }
    result
        .output
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or("unknown")
        .to_string()
}

/// One record per identifier; the first occurrence wins.
pub fn dedup_by_identifier(drives: Vec<Drive>) -> Vec<Drive> {
    let mut seen = HashSet::new();
    drives
        .into_iter()
        .filter(|drive| seen.insert(drive.identifier.clone()))
        .collect()
}

/// Internal drives first, then plain string order of identifiers (`disk10` < `disk2`).
pub fn order_drives(drives: &mut [Drive]) {
    drives.sort_by(|a, b| {
        b.is_internal
            .cmp(&a.is_internal)
            .then_with(|| a.identifier.cmp(&b.identifier))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockSystem;
    use crate::structured::fixtures::{DISK0_ONLY, SSD_INFO, TWO_DISKS, USB_INFO};
    use crate::text_listing::fixtures::LISTING;
    use sysmaint_core::{efi_candidates, DriveSource};

    fn discover(port: MockSystem) -> Vec<Drive> {
        DriveDiscovery::new(port, DiscoveryConfig::default()).discover_drives()
    }

    fn drive(identifier: &str, name: &str, is_internal: bool) -> Drive {
        Drive {
            is_internal,
            ..Drive::new(identifier, name, DriveSource::TextListing)
        }
    }

    fn ids(drives: &[Drive]) -> Vec<&str> {
        drives.iter().map(|d| d.identifier.as_str()).collect()
    }

    #[test]
    fn dedup_keeps_first_occurrence() {
        let drives = vec![
            drive("disk2", "first", false),
            drive("disk0", "ssd", true),
            drive("disk2", "second", true),
            drive("disk0", "again", false),
        ];
        let unique = dedup_by_identifier(drives);
        assert_eq!(ids(&unique), ["disk2", "disk0"]);
        assert_eq!(unique[0].name, "first");
        assert!(!unique[0].is_internal);
        assert_eq!(unique[1].name, "ssd");
    }

    #[test]
    fn ordering_is_internal_first_then_lexicographic() {
        let mut drives = vec![
            drive("disk2", "", false),
            drive("disk10", "", true),
            drive("usb0", "", false),
            drive("disk3", "", true),
            drive("disk1s1", "", true),
            drive("disk11", "", false),
        ];
        order_drives(&mut drives);
        assert_eq!(ids(&drives), ["disk10", "disk1s1", "disk3", "disk11", "disk2", "usb0"]);

        let split = drives.iter().position(|d| !d.is_internal).unwrap();
        assert!(drives[split..].iter().all(|d| !d.is_internal));
        for group in [&drives[..split], &drives[split..]] {
            assert!(group.windows(2).all(|w| w[0].identifier <= w[1].identifier));
        }
    }

    #[test]
    fn scenario_structured_listing_with_usb_stick() {
        let port = MockSystem::new()
            .with_plist(TWO_DISKS)
            .with_info("disk0", SSD_INFO)
            .with_info("disk2", USB_INFO)
            .with_mounts("/dev/disk1s1 on / (apfs, local, journaled)\n/dev/disk2s1 on /Volumes/EFI (msdos, local)\n");
        let drives = discover(port);

        assert_eq!(ids(&drives), ["disk0", "disk1", "disk1s1", "disk2"]);
        assert!(drives[..3].iter().all(|d| d.is_internal));
        assert!(!drives[3].is_internal);
        assert_eq!(drives[1].kind, "APFS Container");
        assert_eq!(drives[2].name, "Macintosh HD");

        let efi = efi_candidates(&drives);
        let efi_ids: Vec<_> = efi.iter().map(|c| c.identifier.as_str()).collect();
        assert_eq!(efi_ids, ["disk0s1", "disk2s1"]);
    }

    #[test]
    fn scenario_everything_fails() {
        let port = MockSystem::new();
        assert!(discover(port).is_empty());
    }

    #[test]
    fn scenario_usb_detection_adds_missing_stick() {
        let port = MockSystem::new()
            .with_plist(DISK0_ONLY)
            .with_info("disk0", SSD_INFO)
            .with_text("/dev/disk0 (internal, physical):\n   1: disk0s1 EFI 209.7 MB EFI\n")
            .with_info("disk3", "Protocol: USB\n")
            .with_mounts("/dev/disk3s1 on /Volumes/EFI (msdos, local, nodev, nosuid)\n");
        let drives = discover(port);

        assert_eq!(ids(&drives), ["disk0", "disk3"]);
        assert!(drives[0].is_internal);
        let stick = &drives[1];
        assert!(!stick.is_internal);
        assert!(stick.is_efi);
        assert_eq!(stick.mount_point, "/Volumes/EFI");
        assert_eq!(stick.source, DriveSource::UsbMountScan);
    }

    #[test]
    fn inventory_record_does_not_hide_mounted_efi_stick() {
        let port = MockSystem::new()
            .with_plist(DISK0_ONLY)
            .with_info("disk0", SSD_INFO)
            .with_usb("Product: Cruzer\nBSD Name: disk3\nCapacity: 8 GB")
            .with_info("disk3", "Protocol: USB\n")
            .with_mounts("/dev/disk3s1 on /Volumes/EFI (msdos, local, nodev, nosuid)\n");
        let drives = discover(port);

        assert_eq!(ids(&drives), ["disk0", "disk3", "usb0"]);
        let stick = &drives[1];
        assert_eq!(stick.kind, "USB (Mounted)");
        assert_eq!(stick.mount_point, "/Volumes/EFI");
        assert!(stick.is_efi);
        assert_eq!(stick.source, DriveSource::UsbMountScan);
        assert_eq!(drives[2].kind, "USB Storage");
    }

    #[test]
    fn structured_failure_falls_through_to_text() {
        let port = MockSystem::new().with_plist("<plist><garbage").with_text(LISTING);
        let drives = discover(port);
        assert_eq!(ids(&drives), ["disk0", "disk2"]);
        assert!(drives.iter().all(|d| d.source == DriveSource::TextListing));
        assert!(drives[0].partitions[1].is_efi);
    }

    #[test]
    fn text_listing_not_consulted_when_structured_succeeds() {
        let port = MockSystem::new()
            .with_plist(DISK0_ONLY)
            .with_info("disk0", SSD_INFO)
            .with_text(LISTING);
        let discovery = DriveDiscovery::new(
            port,
            DiscoveryConfig {
                usb_scan: false,
                ..DiscoveryConfig::default()
            },
        );
        let drives = discovery.discover_drives();
        assert_eq!(ids(&drives), ["disk0"]);
        assert!(!discovery.port().called("list_disks_text"));
    }

    #[test]
    fn usb_step_runs_even_when_listing_found_drives() {
        let port = MockSystem::new()
            .with_plist(DISK0_ONLY)
            .with_info("disk0", SSD_INFO)
            .with_usb("Product: Portable SSD\nCapacity: 1 TB");
        let drives = discover(port);
        assert_eq!(ids(&drives), ["disk0", "usb0"]);
        assert_eq!(drives[1].kind, "USB Storage");
    }

    #[test]
    fn efi_type_is_flagged_whichever_step_produced_it() {
        let structured = discover(MockSystem::new().with_plist(DISK0_ONLY).with_info("disk0", SSD_INFO));
        assert!(structured[0].partitions[0].is_efi);

        let text = discover(MockSystem::new().with_text("/dev/disk7 (external):\n   2: disk7s2 BOOT 200.0 MB EFI System\n"));
        assert!(text[0].partitions[0].is_efi);
    }

    #[test]
    fn storage_inventory_used_before_mount_table() {
        let port = MockSystem::new()
            .with_storage("BOOT:\n\n  Mount Point: /Volumes/BOOT\n  BSD Name: disk4s1\n  File System: MS-DOS FAT32\n")
            .with_mounts("/dev/disk9s1 on /Volumes/Other (exfat, local)\n");
        let drives = discover(port);
        assert_eq!(ids(&drives), ["disk4s1"]);
    }

    #[test]
    fn mount_table_is_last_resort() {
        let port = MockSystem::new()
            .with_mounts("/dev/disk3s1s1 on / (apfs, sealed)\n/dev/disk3s5 on /System/Volumes/Data (apfs, local)\n/dev/disk8s1 on /Volumes/EFI (msdos, local)\n")
            .with_info("disk3", "Protocol: PCI-Express\n")
            .with_info("disk8", "Protocol: SATA\n");
        let drives = discover(port);
        assert_eq!(ids(&drives), ["disk3", "disk8"]);
        assert_eq!(drives[0].name, "/");
        assert!(drives[0].is_internal);
        assert!(drives[1].is_efi);
        assert!(!drives[1].is_internal);
    }

    #[test]
    fn host_info_and_partition_listing() {
        let discovery = DriveDiscovery::new(
            MockSystem::new().with_host("14.4.1\n", "iMacPro1,1\n").with_text(LISTING),
            DiscoveryConfig::default(),
        );
        let host = discovery.host_info();
        assert_eq!(host.os_version, "14.4.1");
        assert_eq!(host.machine, "iMacPro1,1");
        assert_eq!(discovery.list_partition_identifiers().len(), 4);

        let bare = DriveDiscovery::new(MockSystem::new(), DiscoveryConfig::default());
        assert_eq!(bare.host_info().os_version, "unknown");
        assert!(bare.list_partition_identifiers().is_empty());
        assert!(bare.snapshot().drives.is_empty());
    }
}
