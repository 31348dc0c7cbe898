use lazy_static::lazy_static;
use regex::Regex;
use sysmaint_core::{display_value, exact_bytes};

lazy_static! {
    static ref USB_PROTOCOL_RE: Regex = Regex::new(r"Protocol.*USB").unwrap();
    static ref USB_PROTOCOL_ANY_CASE_RE: Regex = Regex::new(r"(?i)protocol.*usb").unwrap();
}

/// Fields of interest from `diskutil info` text output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiskInfo {
    pub media_name: Option<String>,
    pub volume_name: Option<String>,
    pub size: Option<String>,
    pub size_bytes: Option<u64>,
    pub protocol: Option<String>,
    pub bus_protocol: Option<String>,
    pub mount_point: Option<String>,
    pub bundle_type: Option<String>,
    pub device_node: Option<String>,
}

impl DiskInfo {
    pub fn parse(output: &str) -> Self {
        let mut info = DiskInfo::default();
        let mut size_rank = usize::MAX;
        for line in output.lines() {
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            let value = value.to_string();
            match key.trim() {
                "Device / Media Name" => info.media_name = Some(value),
                "Volume Name" => info.volume_name = Some(value),
                "Protocol" => info.protocol = Some(value),
                "Bus Protocol" => info.bus_protocol = Some(value),
                "Device Node" => info.device_node = Some(value),
                "Type (Bundle)" => info.bundle_type = Some(value),
                "Mount Point" => {
                    if !value.starts_with("Not applicable") {
                        info.mount_point = Some(value);
                    }
                }
                key => {
                    // Whole disks report "Disk Size", containers "Total Size"; keep the best one seen.
                    if let Some(rank) = ["Disk Size", "Total Size", "Size"].iter().position(|k| *k == key) {
                        if rank < size_rank {
                            size_rank = rank;
                            info.size = Some(display_value(&value));
                            info.size_bytes = exact_bytes(&value);
                        }
                    }
                }
            }
        }
        info
    }

    /// `<protocol> (<bus protocol>)`; the bus falls back to the protocol when absent.
    pub fn transport_label(&self) -> String {
        let protocol = self.protocol.as_deref().unwrap_or("Unknown");
        let bus = self
            .bus_protocol
            .as_deref()
            .or(self.protocol.as_deref())
            .unwrap_or("Unknown");
        format!("{} ({})", protocol, bus)
    }
}

/// A line shaped like `Protocol: USB`, matched case-sensitively.
pub fn reports_usb_protocol(output: &str) -> bool {
    output.lines().any(|line| USB_PROTOCOL_RE.is_match(line))
}

pub fn reports_usb_protocol_any_case(output: &str) -> bool {
    output.lines().any(|line| USB_PROTOCOL_ANY_CASE_RE.is_match(line))
}

pub fn mentions_apfs(output: &str) -> bool {
    output.to_ascii_lowercase().contains("apfs")
}
