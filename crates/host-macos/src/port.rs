use log::debug;

use crate::config::DiscoveryConfig;
use crate::runner::CommandRunner;
use crate::usb::mass_storage_excerpt;

/// Captured stdout of one query plus whether it succeeded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub output: String,
    pub success: bool,
}

impl CommandOutput {
    pub fn ok(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            success: true,
        }
    }

    pub fn failed() -> Self {
        Self::default()
    }

    /// Succeeded and printed something other than whitespace.
    pub fn has_output(&self) -> bool {
        self.success && !self.output.trim().is_empty()
    }
}

/// Everything drive discovery needs to know about the live system.
pub trait SystemQueryPort {
    fn list_disks_plist(&self) -> CommandOutput;
    fn list_disks_text(&self) -> CommandOutput;
    /// `identifier` is either `diskN...` or an absolute `/dev/...` path.
    fn disk_info(&self, identifier: &str) -> CommandOutput;
    fn mounted_filesystems(&self) -> CommandOutput;
    /// Mass-storage excerpt of the USB hardware inventory.
    fn usb_storage_devices(&self) -> CommandOutput;
    fn storage_inventory(&self) -> CommandOutput;
    fn free_space(&self, mount_point: &str) -> CommandOutput;
    fn product_version(&self) -> CommandOutput;
    fn hardware_model(&self) -> CommandOutput;
}

/// `diskutil`, `mount`, `df`, `system_profiler`, `sw_vers` and `sysctl`.
#[derive(Debug, Clone)]
pub struct MacosSystem {
    runner: CommandRunner,
}

impl MacosSystem {
    pub fn new(config: &DiscoveryConfig) -> Self {
        let runner = CommandRunner::new(config.command_timeout);
        debug!("system queries time out after {:?}", runner.timeout());
        Self { runner }
    }
}

impl SystemQueryPort for MacosSystem {
    fn list_disks_plist(&self) -> CommandOutput {
        self.runner.run("diskutil", &["list", "-plist"])
    }

    fn list_disks_text(&self) -> CommandOutput {
        self.runner.run("diskutil", &["list"])
    }

    fn disk_info(&self, identifier: &str) -> CommandOutput {
        let device = device_path(identifier);
        self.runner.run("diskutil", &["info", &device])
    }

    fn mounted_filesystems(&self) -> CommandOutput {
        self.runner.run("mount", &[])
    }

    fn usb_storage_devices(&self) -> CommandOutput {
        let result = self.runner.run("system_profiler", &["SPUSBDataType"]);
        if !result.success {
            return result;
        }
        let excerpt = mass_storage_excerpt(&result.output);
        CommandOutput {
            success: !excerpt.is_empty(),
            output: excerpt,
        }
    }

    fn storage_inventory(&self) -> CommandOutput {
        self.runner.run("system_profiler", &["SPStorageDataType"])
    }

    fn free_space(&self, mount_point: &str) -> CommandOutput {
        self.runner.run("df", &["-h", mount_point])
    }

    fn product_version(&self) -> CommandOutput {
        self.runner.run("sw_vers", &["-productVersion"])
    }

    fn hardware_model(&self) -> CommandOutput {
        self.runner.run("sysctl", &["-n", "hw.model"])
    }
}

fn device_path(identifier: &str) -> String {
    if identifier.starts_with('/') {
        identifier.to_string()
    } else {
        format!("/dev/{}", identifier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_path_prefixes_bare_identifiers() {
        assert_eq!(device_path("disk2"), "/dev/disk2");
        assert_eq!(device_path("/dev/disk2s1"), "/dev/disk2s1");
    }

    #[test]
    fn has_output_needs_success_and_text() {
        assert!(CommandOutput::ok("disk0\n").has_output());
        assert!(!CommandOutput::ok("  \n").has_output());
        assert!(!CommandOutput {
            output: "stale".to_string(),
            success: false,
        }
        .has_output());
        assert!(!CommandOutput::failed().has_output());
    }
}
