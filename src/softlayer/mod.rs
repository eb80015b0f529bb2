//! SoftLayer API surface consumed by the provisioning core.
//!
//! The [`SoftLayerClient`] trait names exactly the remote calls the plugin
//! issues. [`HttpSoftLayerClient`] talks to the REST endpoint; tests use the
//! scripted client in [`crate::test_support`].

mod client;
mod error;
pub mod types;

use std::future::Future;
use std::pin::Pin;

pub use client::{DEFAULT_API_ENDPOINT, HttpSoftLayerClient};
pub use error::SoftLayerError;
pub use types::{
    DiskId, GuestId, ImageTemplate, ItemPrice, NetworkStorage, OrderReceipt, PowerState,
    StemcellId, Transaction, UpgradeOrder, VirtualGuest, VirtualGuestTemplate,
};

/// Future returned by every remote call.
pub type ApiFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, SoftLayerError>> + Send + 'a>>;

/// Future returned by lookups that distinguish "absent" from "failed".
pub type LookupFuture<'a, T> = ApiFuture<'a, Option<T>>;

/// Remote operations required to provision and manage virtual guests.
pub trait SoftLayerClient: Clone + Send + Sync {
    /// Orders a new virtual guest from a creation template.
    fn create_virtual_guest<'a>(
        &'a self,
        template: &'a VirtualGuestTemplate,
    ) -> ApiFuture<'a, VirtualGuest>;

    /// Fetches a guest by id, returning `None` when it does not exist.
    fn get_virtual_guest(&self, id: GuestId) -> LookupFuture<'_, VirtualGuest>;

    /// Finds the account guest whose private backend address is `ip`.
    fn find_by_primary_backend_ip<'a>(&'a self, ip: &'a str) -> LookupFuture<'a, VirtualGuest>;

    /// Finds the account guest whose public address is `ip`.
    fn find_by_primary_ip<'a>(&'a self, ip: &'a str) -> LookupFuture<'a, VirtualGuest>;

    /// Lists the transactions currently running against a guest.
    fn active_transactions(&self, id: GuestId) -> ApiFuture<'_, Vec<Transaction>>;

    /// Returns the most recent transaction of a guest, if any.
    fn last_transaction(&self, id: GuestId) -> LookupFuture<'_, Transaction>;

    /// Returns the power state of a guest.
    fn power_state(&self, id: GuestId) -> ApiFuture<'_, PowerState>;

    /// Lists the upgrade prices orderable for a guest.
    fn upgrade_item_prices(&self, id: GuestId) -> ApiFuture<'_, Vec<ItemPrice>>;

    /// Places an upgrade order.
    fn place_order<'a>(&'a self, order: &'a UpgradeOrder) -> ApiFuture<'a, OrderReceipt>;

    /// Re-images a guest from a stemcell template, discarding its disks.
    fn reload_operating_system(&self, id: GuestId, stemcell: StemcellId) -> ApiFuture<'_, ()>;

    /// Issues a soft reboot.
    fn reboot_soft(&self, id: GuestId) -> ApiFuture<'_, ()>;

    /// Replaces the user metadata blob the guest agent reads on boot.
    fn set_user_metadata<'a>(&'a self, id: GuestId, metadata: &'a str) -> ApiFuture<'a, ()>;

    /// Grants a guest access to an iSCSI volume.
    fn allow_access_from_virtual_guest(&self, disk: DiskId, guest: GuestId) -> ApiFuture<'_, ()>;

    /// Fetches a network storage volume, returning `None` when it does not exist.
    fn get_network_storage(&self, id: DiskId) -> LookupFuture<'_, NetworkStorage>;

    /// Fetches a stemcell template group, returning `None` when it does not exist.
    fn get_image_template(&self, id: StemcellId) -> LookupFuture<'_, ImageTemplate>;
}
