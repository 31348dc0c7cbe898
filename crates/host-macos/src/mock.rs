use std::cell::RefCell;
use std::collections::HashMap;

use crate::port::{CommandOutput, SystemQueryPort};

/// Scripted port for tests. Anything not configured answers as a failed query.
#[derive(Debug, Default)]
pub struct MockSystem {
    plist: Option<String>,
    text: Option<String>,
    info: HashMap<String, String>,
    mounts: Option<String>,
    usb: Option<String>,
    storage: Option<String>,
    df: HashMap<String, String>,
    product_version: Option<String>,
    hardware_model: Option<String>,
    calls: RefCell<Vec<String>>,
}

impl MockSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_plist(mut self, output: &str) -> Self {
        self.plist = Some(output.to_string());
        self
    }

    pub fn with_text(mut self, output: &str) -> Self {
        self.text = Some(output.to_string());
        self
    }

    pub fn with_info(mut self, identifier: &str, output: &str) -> Self {
        self.info.insert(bare(identifier).to_string(), output.to_string());
        self
    }

    pub fn with_mounts(mut self, output: &str) -> Self {
        self.mounts = Some(output.to_string());
        self
    }

    pub fn with_usb(mut self, output: &str) -> Self {
        self.usb = Some(output.to_string());
        self
    }

    pub fn with_storage(mut self, output: &str) -> Self {
        self.storage = Some(output.to_string());
        self
    }

    pub fn with_df(mut self, mount_point: &str, output: &str) -> Self {
        self.df.insert(mount_point.to_string(), output.to_string());
        self
    }

    pub fn with_host(mut self, version: &str, model: &str) -> Self {
        self.product_version = Some(version.to_string());
        self.hardware_model = Some(model.to_string());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    pub fn called(&self, call: &str) -> bool {
        self.calls.borrow().iter().any(|c| c == call)
    }

    fn answer(&self, call: String, output: Option<&String>) -> CommandOutput {
        self.calls.borrow_mut().push(call);
        match output {
            Some(text) => CommandOutput::ok(text.as_str()),
            None => CommandOutput::failed(),
        }
    }
}

fn bare(identifier: &str) -> &str {
    identifier.strip_prefix("/dev/").unwrap_or(identifier)
}

impl SystemQueryPort for MockSystem {
    fn list_disks_plist(&self) -> CommandOutput {
        self.answer("list_disks_plist".to_string(), self.plist.as_ref())
    }

    fn list_disks_text(&self) -> CommandOutput {
        self.answer("list_disks_text".to_string(), self.text.as_ref())
    }

    fn disk_info(&self, identifier: &str) -> CommandOutput {
        let id = bare(identifier);
        self.answer(format!("disk_info {}", id), self.info.get(id))
    }

    fn mounted_filesystems(&self) -> CommandOutput {
        self.answer("mounted_filesystems".to_string(), self.mounts.as_ref())
    }

    fn usb_storage_devices(&self) -> CommandOutput {
        self.answer("usb_storage_devices".to_string(), self.usb.as_ref())
    }

    fn storage_inventory(&self) -> CommandOutput {
        self.answer("storage_inventory".to_string(), self.storage.as_ref())
    }

    fn free_space(&self, mount_point: &str) -> CommandOutput {
        self.answer(format!("free_space {}", mount_point), self.df.get(mount_point))
    }

    fn product_version(&self) -> CommandOutput {
        self.answer("product_version".to_string(), self.product_version.as_ref())
    }

    fn hardware_model(&self) -> CommandOutput {
        self.answer("hardware_model".to_string(), self.hardware_model.as_ref())
    }
}
