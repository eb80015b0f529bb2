//! VM cloud properties supplied by the director.

use serde::Deserialize;
use uuid::Uuid;

use crate::softlayer::types::{
    BlockDevice, BlockDeviceTemplateGroup, Datacenter, NetworkComponent, PrimaryNetworkComponent, SshKey,
    VirtualGuestTemplate,
};
use crate::stemcell::Stemcell;

use super::VmError;

const DEFAULT_NAME_PREFIX: &str = "bosh-";

/// Requested shape of a virtual guest.
///
/// Field names follow the director's `cloud_properties` document.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase", default)]
#[expect(
    clippy::struct_excessive_bools,
    reason = "the director exposes each provisioning flag individually"
)]
pub struct CloudProperties {
    /// Host name prefix; a unique suffix is appended.
    pub vm_name_prefix: String,
    /// DNS domain. Required.
    pub domain: String,
    /// CPU count. Required.
    pub start_cpus: u32,
    /// Memory in megabytes. Required.
    pub max_memory: u64,
    /// Datacenter placement.
    pub datacenter: Datacenter,
    /// Ephemeral disk size in gigabytes; zero for none.
    pub ephemeral_disk_size: u64,
    /// Root disk layout.
    pub block_devices: Vec<BlockDevice>,
    /// Bill hourly.
    pub hourly_billing_flag: bool,
    /// Use local disks.
    pub local_disk_flag: bool,
    /// Request a dedicated host.
    pub dedicated_account_host_only_flag: bool,
    /// Omit the public interface.
    pub private_network_only_flag: bool,
    /// Interface speed requests.
    pub network_components: Vec<NetworkComponent>,
    /// Public VLAN placement.
    pub primary_network_component: Option<PrimaryNetworkComponent>,
    /// Backend VLAN placement.
    pub primary_backend_network_component: Option<PrimaryNetworkComponent>,
    /// SSH keys to install.
    pub ssh_keys: Vec<SshKey>,
    /// Script run after provisioning.
    pub post_install_script_uri: Option<String>,
    /// Address of the director; when absent the guest's own backend address is used.
    #[serde(rename = "bosh_ip")]
    pub bosh_ip: Option<String>,
}

impl CloudProperties {
    /// Checks the fields every creation template needs.
    ///
    /// # Errors
    ///
    /// Returns [`VmError::Validation`] naming the first missing field.
    pub fn validate(&self) -> Result<(), VmError> {
        if self.start_cpus == 0 {
            return Err(VmError::Validation(String::from("startCpus must be set")));
        }
        if self.max_memory == 0 {
            return Err(VmError::Validation(String::from("maxMemory must be set")));
        }
        if self.domain.trim().is_empty() {
            return Err(VmError::Validation(String::from("domain must be set")));
        }
        Ok(())
    }

    /// Returns the configured director address, ignoring blank values.
    #[must_use]
    pub fn bosh_ip(&self) -> Option<&str> {
        self.bosh_ip
            .as_deref()
            .map(str::trim)
            .filter(|ip| !ip.is_empty())
    }

    /// Label used when selecting an ephemeral disk price.
    #[must_use]
    pub const fn disk_kind(&self) -> &'static str {
        if self.local_disk_flag { "LOCAL" } else { "SAN" }
    }

    /// Builds the SoftLayer creation template for a new guest booted from `stemcell`.
    #[must_use]
    pub fn virtual_guest_template(&self, stemcell: &Stemcell) -> VirtualGuestTemplate {
        let prefix = if self.vm_name_prefix.trim().is_empty() {
            DEFAULT_NAME_PREFIX
        } else {
            self.vm_name_prefix.trim()
        };

        VirtualGuestTemplate {
            hostname: format!("{prefix}{}", Uuid::new_v4().simple()),
            domain: self.domain.trim().to_owned(),
            start_cpus: self.start_cpus,
            max_memory: self.max_memory,
            datacenter: self.datacenter.clone(),
            block_device_template_group: BlockDeviceTemplateGroup {
                global_identifier: stemcell.uuid.clone(),
            },
            hourly_billing_flag: self.hourly_billing_flag,
            local_disk_flag: self.local_disk_flag,
            dedicated_account_host_only_flag: self.dedicated_account_host_only_flag,
            private_network_only_flag: self.private_network_only_flag,
            block_devices: self.block_devices.clone(),
            network_components: self.network_components.clone(),
            primary_network_component: self.primary_network_component,
            primary_backend_network_component: self.primary_backend_network_component,
            ssh_keys: self.ssh_keys.clone(),
            post_install_script_uri: self
                .post_install_script_uri
                .clone()
                .filter(|uri| !uri.trim().is_empty()),
        }
    }
}
