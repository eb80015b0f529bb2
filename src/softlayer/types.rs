//! Typed views of the SoftLayer records the plugin reads and writes.

use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Clone, Copy, Debug, Default, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize,
        )]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            /// Wraps a raw SoftLayer identifier.
            #[must_use]
            pub const fn new(value: u64) -> Self {
                Self(value)
            }

            /// Returns the raw identifier.
            #[must_use]
            pub const fn get(self) -> u64 {
                self.0
            }

            /// SoftLayer reports a zero identifier for records that do not exist.
            #[must_use]
            pub const fn is_zero(self) -> bool {
                self.0 == 0
            }
        }

        impl From<u64> for $name {
            fn from(value: u64) -> Self {
                Self(value)
            }
        }

        impl FromStr for $name {
            type Err = ParseIntError;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                value.trim().parse().map(Self)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

numeric_id!(
    /// Identifier of a SoftLayer virtual guest (the director's VM cid).
    GuestId
);
numeric_id!(
    /// Identifier of a SoftLayer network storage volume (the director's disk cid).
    DiskId
);
numeric_id!(
    /// Identifier of a block device template group (the director's stemcell cid).
    StemcellId
);

/// Virtual guest record as returned by `SoftLayer_Virtual_Guest::getObject`.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct VirtualGuest {
    /// Backend-native identifier.
    pub id: GuestId,
    /// Short host name.
    pub hostname: String,
    /// DNS domain.
    pub domain: String,
    /// Host name and domain joined.
    pub fully_qualified_domain_name: String,
    /// Public address, absent for private-only guests.
    pub primary_ip_address: Option<String>,
    /// Address on the private backend network.
    pub primary_backend_ip_address: Option<String>,
}

/// Named transaction group such as `Service Setup` or `Cloud Instance Upgrade`.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TransactionGroup {
    /// Group name.
    pub name: String,
}

/// Status of a provisioning transaction.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TransactionStatus {
    /// Machine-readable status (for example `COMPLETE`).
    pub name: String,
    /// Human-readable status (for example `Complete`).
    pub friendly_name: String,
}

/// A remote provisioning transaction. Only ever read inside a wait predicate.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Transaction {
    /// Transaction identifier.
    pub id: u64,
    /// Group the transaction belongs to.
    pub transaction_group: Option<TransactionGroup>,
    /// Current status.
    pub transaction_status: Option<TransactionStatus>,
}

impl Transaction {
    /// Returns the group name, or an empty string when SoftLayer omits it.
    #[must_use]
    pub fn group_name(&self) -> &str {
        self.transaction_group
            .as_ref()
            .map_or("", |group| group.name.as_str())
    }

    /// Returns `true` once the transaction has reached its terminal success state.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.transaction_status.as_ref().is_some_and(|status| {
            status.name.eq_ignore_ascii_case("COMPLETE") || status.friendly_name.contains("Complete")
        })
    }

    /// Returns `true` when the transaction belongs to `group` and has completed.
    #[must_use]
    pub fn is_complete_in_group(&self, group: &str) -> bool {
        self.group_name().contains(group) && self.is_complete()
    }
}

/// Power state of a virtual guest.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct PowerState {
    /// Machine-readable state (`RUNNING`, `HALTED`, ...).
    pub key_name: String,
    /// Human-readable state.
    pub name: String,
}

impl PowerState {
    /// Returns `true` when the guest is back online.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.key_name.eq_ignore_ascii_case("RUNNING")
    }
}

/// Product category reference carried by prices and orders.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Category {
    /// Category code, for example `guest_disk1`.
    pub category_code: String,
}

/// Orderable product item.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Item {
    /// Item identifier.
    pub id: u64,
    /// Description such as `25 GB (LOCAL)`.
    pub description: String,
    /// Capacity; SoftLayer serialises it either as a number or a string.
    pub capacity: Value,
}

impl Item {
    /// Parses the capacity in gigabytes.
    #[must_use]
    pub fn capacity_gb(&self) -> Option<u64> {
        match &self.capacity {
            Value::Number(number) => number.as_u64(),
            Value::String(text) => text.trim().parse().ok(),
            _ => None,
        }
    }
}

/// Price entry returned by `getUpgradeItemPrices`.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ItemPrice {
    /// Price identifier used when ordering.
    pub id: u64,
    /// Item the price applies to.
    pub item: Option<Item>,
    /// Categories the price is valid for.
    pub categories: Vec<Category>,
}

impl ItemPrice {
    /// Returns `true` when the price belongs to the given category.
    #[must_use]
    pub fn in_category(&self, code: &str) -> bool {
        self.categories
            .iter()
            .any(|category| category.category_code == code)
    }
}

/// Reference to an object by id inside an order container.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub struct IdRef {
    /// Referenced identifier.
    pub id: u64,
}

/// Price line of an upgrade order.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderPrice {
    /// Price identifier.
    pub id: u64,
    /// Category the price is ordered for.
    pub categories: Vec<Category>,
}

/// Free-form order property.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct OrderProperty {
    /// Property name.
    pub name: String,
    /// Property value.
    pub value: String,
}

/// `SoftLayer_Container_Product_Order_Virtual_Guest_Upgrade` payload.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpgradeOrder {
    /// Container type discriminator expected by the order service.
    pub complex_type: String,
    /// Guests being upgraded.
    pub virtual_guests: Vec<IdRef>,
    /// Prices being ordered.
    pub prices: Vec<OrderPrice>,
    /// Additional order properties.
    pub properties: Vec<OrderProperty>,
}

/// Receipt returned by `SoftLayer_Product_Order::placeOrder`.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct OrderReceipt {
    /// Identifier of the placed order.
    pub order_id: u64,
}

/// iSCSI network storage volume.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct NetworkStorage {
    /// Volume identifier.
    pub id: DiskId,
    /// Provisioned capacity in gigabytes.
    pub capacity_gb: u64,
    /// iSCSI user name assigned by SoftLayer.
    pub username: String,
}

/// Block device template group backing a stemcell.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ImageTemplate {
    /// Template group identifier.
    pub id: StemcellId,
    /// Global identifier used when ordering guests from the template.
    pub global_identifier: String,
}

/// Datacenter placement.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct Datacenter {
    /// Short datacenter name such as `dal05`.
    pub name: String,
}

/// VLAN reference.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct NetworkVlan {
    /// VLAN identifier.
    pub id: u64,
}

/// Primary (public or backend) network component placement.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PrimaryNetworkComponent {
    /// VLAN the component is attached to.
    pub network_vlan: NetworkVlan,
}

/// Network interface speed request.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NetworkComponent {
    /// Maximum speed in Mbps.
    pub max_speed: u32,
}

/// SSH key reference installed on new guests.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct SshKey {
    /// Key identifier.
    pub id: u64,
}

/// Disk image size of a block device.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct DiskImage {
    /// Capacity in gigabytes.
    pub capacity: u64,
}

/// Disk slot requested at provisioning time.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BlockDevice {
    /// Device slot (`0` is the root disk).
    pub device: String,
    /// Requested image size.
    pub disk_image: DiskImage,
}

/// Image the guest boots from.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BlockDeviceTemplateGroup {
    /// Global identifier of the template group.
    pub global_identifier: String,
}

/// Provider-native creation template for `SoftLayer_Virtual_Guest::createObject`.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
#[expect(
    clippy::struct_excessive_bools,
    reason = "mirrors the provisioning flags of the SoftLayer template"
)]
pub struct VirtualGuestTemplate {
    /// Host name of the new guest.
    pub hostname: String,
    /// DNS domain of the new guest.
    pub domain: String,
    /// Number of CPUs.
    pub start_cpus: u32,
    /// Memory in megabytes.
    pub max_memory: u64,
    /// Datacenter placement.
    pub datacenter: Datacenter,
    /// Stemcell image.
    pub block_device_template_group: BlockDeviceTemplateGroup,
    /// Bill hourly rather than monthly.
    pub hourly_billing_flag: bool,
    /// Use local rather than SAN disks.
    pub local_disk_flag: bool,
    /// Request a dedicated host.
    pub dedicated_account_host_only_flag: bool,
    /// Omit the public network interface.
    pub private_network_only_flag: bool,
    /// Disk layout.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub block_devices: Vec<BlockDevice>,
    /// Interface speed requests.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub network_components: Vec<NetworkComponent>,
    /// Public VLAN placement.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_network_component: Option<PrimaryNetworkComponent>,
    /// Backend VLAN placement.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_backend_network_component: Option<PrimaryNetworkComponent>,
    /// SSH keys installed at provisioning time.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ssh_keys: Vec<SshKey>,
    /// Script fetched and run after provisioning.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_install_script_uri: Option<String>,
}
