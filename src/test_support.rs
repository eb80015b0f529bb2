//! Test support utilities shared across unit and integration tests.

use std::collections::{BTreeMap, BTreeSet};
use std::env;
use std::ffi::OsString;
use std::future::ready;
use std::sync::{Arc, Mutex as StdMutex, MutexGuard as StdMutexGuard, PoisonError};

use serde_json::json;
use tokio::sync::{Mutex, MutexGuard};

use crate::softlayer::types::{Category, Item, TransactionGroup, TransactionStatus};
use crate::softlayer::{
    ApiFuture, DiskId, GuestId, ImageTemplate, ItemPrice, LookupFuture, NetworkStorage,
    OrderReceipt, PowerState, SoftLayerClient, SoftLayerError, StemcellId, Transaction,
    UpgradeOrder, VirtualGuest, VirtualGuestTemplate,
};
use crate::vm::{CLOUD_INSTANCE_UPGRADE, HostsRegistrar, SERVICE_SETUP};

/// Identifier assigned to the first guest created through [`FakeSoftLayerClient`].
pub const FIRST_GUEST_ID: u64 = 1_234_567;
/// Backend address given to guests created through [`FakeSoftLayerClient`].
pub const FAKE_BACKEND_IP: &str = "10.0.0.7";
/// Public address given to guests created through [`FakeSoftLayerClient`].
pub const FAKE_PUBLIC_IP: &str = "169.45.10.2";

/// One remote call recorded by [`FakeSoftLayerClient`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ClientCall {
    /// `SoftLayer_Virtual_Guest::createObject`.
    CreateObject {
        /// Requested host name.
        hostname: String,
    },
    /// `SoftLayer_Virtual_Guest::getObject`.
    GetObject(GuestId),
    /// Account lookup by backend address.
    FindByPrimaryBackendIp(String),
    /// Account lookup by public address.
    FindByPrimaryIp(String),
    /// `getActiveTransactions`.
    GetActiveTransactions(GuestId),
    /// `getLastTransaction`.
    GetLastTransaction(GuestId),
    /// `getPowerState`.
    GetPowerState(GuestId),
    /// `getUpgradeItemPrices`.
    GetUpgradeItemPrices(GuestId),
    /// `SoftLayer_Product_Order::placeOrder`.
    PlaceOrder(UpgradeOrder),
    /// `reloadOperatingSystem`.
    ReloadOperatingSystem(GuestId, StemcellId),
    /// `rebootSoft`.
    RebootSoft(GuestId),
    /// `setUserMetadata` with the pushed blob.
    SetUserMetadata(GuestId, String),
    /// `SoftLayer_Network_Storage::allowAccessFromVirtualGuest`.
    AllowAccessFromVirtualGuest(DiskId, GuestId),
    /// `SoftLayer_Network_Storage::getObject`.
    GetNetworkStorage(DiskId),
    /// `SoftLayer_Virtual_Guest_Block_Device_Template_Group::getObject`.
    GetImageTemplate(StemcellId),
}

impl ClientCall {
    /// Returns the SoftLayer method name, used by [`FakeSoftLayerClient::fail_on`].
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::CreateObject { .. } => "createObject",
            Self::GetObject(_) => "getObject",
            Self::FindByPrimaryBackendIp(_) => "getObjectByPrimaryBackendIpAddress",
            Self::FindByPrimaryIp(_) => "getObjectByPrimaryIpAddress",
            Self::GetActiveTransactions(_) => "getActiveTransactions",
            Self::GetLastTransaction(_) => "getLastTransaction",
            Self::GetPowerState(_) => "getPowerState",
            Self::GetUpgradeItemPrices(_) => "getUpgradeItemPrices",
            Self::PlaceOrder(_) => "placeOrder",
            Self::ReloadOperatingSystem(..) => "reloadOperatingSystem",
            Self::RebootSoft(_) => "rebootSoft",
            Self::SetUserMetadata(..) => "setUserMetadata",
            Self::AllowAccessFromVirtualGuest(..) => "allowAccessFromVirtualGuest",
            Self::GetNetworkStorage(_) => "getNetworkStorage",
            Self::GetImageTemplate(_) => "getImageTemplate",
        }
    }
}

#[derive(Debug)]
struct FakeState {
    guests: BTreeMap<GuestId, VirtualGuest>,
    storage: BTreeMap<DiskId, NetworkStorage>,
    templates: BTreeMap<StemcellId, ImageTemplate>,
    next_guest_id: u64,
    pending_transactions: usize,
    last_transaction: Option<Transaction>,
    power_state: PowerState,
    prices: Vec<ItemPrice>,
    failures: BTreeSet<&'static str>,
    forget_created: bool,
    calls: Vec<ClientCall>,
}

impl Default for FakeState {
    fn default() -> Self {
        Self {
            guests: BTreeMap::new(),
            storage: BTreeMap::new(),
            templates: BTreeMap::new(),
            next_guest_id: FIRST_GUEST_ID,
            pending_transactions: 0,
            last_transaction: None,
            power_state: PowerState {
                key_name: String::from("RUNNING"),
                name: String::from("Running"),
            },
            prices: vec![
                disk_price(1001, "25 GB (LOCAL)", 25),
                disk_price(1002, "25 GB (SAN)", 25),
                disk_price(1003, "100 GB (LOCAL)", 100),
                disk_price(1004, "100 GB (SAN)", 100),
            ],
            failures: BTreeSet::new(),
            forget_created: false,
            calls: Vec::new(),
        }
    }
}

/// In-memory [`SoftLayerClient`] that records every call.
///
/// Orders and reloads start one transaction that shows up in the next
/// `getActiveTransactions` poll and is gone afterwards. They also record a
/// completed last transaction of the matching group, so every wait settles
/// without real delays.
#[derive(Clone, Debug, Default)]
pub struct FakeSoftLayerClient {
    state: Arc<StdMutex<FakeState>>,
}

impl FakeSoftLayerClient {
    /// Creates a client with no guests and the default disk prices.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> StdMutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Seeds an existing guest.
    #[must_use]
    pub fn with_guest(self, guest: VirtualGuest) -> Self {
        self.lock().guests.insert(guest.id, guest);
        self
    }

    /// Seeds an existing disk.
    #[must_use]
    pub fn with_disk(self, id: u64, capacity_gb: u64) -> Self {
        let volume = NetworkStorage {
            id: DiskId::new(id),
            capacity_gb,
            username: format!("SL0{id}"),
        };
        self.lock().storage.insert(volume.id, volume);
        self
    }

    /// Seeds an existing stemcell.
    #[must_use]
    pub fn with_stemcell(self, id: u64, uuid: &str) -> Self {
        let template = ImageTemplate {
            id: StemcellId::new(id),
            global_identifier: uuid.to_owned(),
        };
        self.lock().templates.insert(template.id, template);
        self
    }

    /// Replaces the upgrade prices.
    #[must_use]
    pub fn with_prices(self, prices: Vec<ItemPrice>) -> Self {
        self.lock().prices = prices;
        self
    }

    /// Sets the reported power state.
    #[must_use]
    pub fn with_power_state(self, key_name: &str) -> Self {
        self.lock().power_state = PowerState {
            key_name: key_name.to_owned(),
            name: key_name.to_owned(),
        };
        self
    }

    /// Sets the reported last transaction.
    #[must_use]
    pub fn with_last_transaction(self, last: Option<Transaction>) -> Self {
        self.lock().last_transaction = last;
        self
    }

    /// Makes every call to `method` fail.
    #[must_use]
    pub fn fail_on(self, method: &'static str) -> Self {
        self.lock().failures.insert(method);
        self
    }

    /// Makes guests ordered through `createObject` invisible to later
    /// lookups, as if they vanished while provisioning.
    #[must_use]
    pub fn forgetting_created_guests(self) -> Self {
        self.lock().forget_created = true;
        self
    }

    /// Returns every call recorded so far.
    #[must_use]
    pub fn calls(&self) -> Vec<ClientCall> {
        self.lock().calls.clone()
    }

    /// Returns the method names of every call recorded so far.
    #[must_use]
    pub fn call_names(&self) -> Vec<&'static str> {
        self.lock().calls.iter().map(ClientCall::name).collect()
    }

    /// Counts calls to `method`.
    #[must_use]
    pub fn count(&self, method: &str) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|call| call.name() == method)
            .count()
    }

    fn respond<T>(
        &self,
        call: ClientCall,
        reply: impl FnOnce(&mut FakeState) -> Result<T, SoftLayerError>,
    ) -> Result<T, SoftLayerError> {
        let mut state = self.lock();
        let method = call.name();
        state.calls.push(call);
        if state.failures.contains(method) {
            return Err(SoftLayerError::Api {
                path: method.to_owned(),
                status: 500,
                message: String::from("simulated failure"),
            });
        }
        reply(&mut state)
    }

    fn find_guest_by(
        &self,
        call: ClientCall,
        ip: &str,
        address: fn(&VirtualGuest) -> Option<&str>,
    ) -> Result<Option<VirtualGuest>, SoftLayerError> {
        self.respond(call, |state| {
            Ok(state
                .guests
                .values()
                .find(|guest| address(guest) == Some(ip))
                .cloned())
        })
    }
}

impl SoftLayerClient for FakeSoftLayerClient {
    fn create_virtual_guest<'a>(
        &'a self,
        template: &'a VirtualGuestTemplate,
    ) -> ApiFuture<'a, VirtualGuest> {
        let call = ClientCall::CreateObject {
            hostname: template.hostname.clone(),
        };
        Box::pin(ready(self.respond(call, |state| {
            let guest = virtual_guest(
                state.next_guest_id,
                &template.hostname,
                &template.domain,
                Some(FAKE_BACKEND_IP),
                Some(FAKE_PUBLIC_IP),
            );
            state.next_guest_id += 1;
            if !state.forget_created {
                state.guests.insert(guest.id, guest.clone());
            }
            state.last_transaction = Some(transaction(SERVICE_SETUP, "Complete"));
            Ok(guest)
        })))
    }

    fn get_virtual_guest(&self, id: GuestId) -> LookupFuture<'_, VirtualGuest> {
        Box::pin(ready(self.respond(ClientCall::GetObject(id), |state| {
            Ok(state.guests.get(&id).cloned())
        })))
    }

    fn find_by_primary_backend_ip<'a>(&'a self, ip: &'a str) -> LookupFuture<'a, VirtualGuest> {
        Box::pin(ready(self.find_guest_by(
            ClientCall::FindByPrimaryBackendIp(ip.to_owned()),
            ip,
            |guest| guest.primary_backend_ip_address.as_deref(),
        )))
    }

    fn find_by_primary_ip<'a>(&'a self, ip: &'a str) -> LookupFuture<'a, VirtualGuest> {
        Box::pin(ready(self.find_guest_by(
            ClientCall::FindByPrimaryIp(ip.to_owned()),
            ip,
            |guest| guest.primary_ip_address.as_deref(),
        )))
    }

    fn active_transactions(&self, id: GuestId) -> ApiFuture<'_, Vec<Transaction>> {
        Box::pin(ready(self.respond(
            ClientCall::GetActiveTransactions(id),
            |state| {
                let running = (0..state.pending_transactions)
                    .map(|_| transaction("Pending Transaction", "Active"))
                    .collect();
                state.pending_transactions = 0;
                Ok(running)
            },
        )))
    }

    fn last_transaction(&self, id: GuestId) -> LookupFuture<'_, Transaction> {
        Box::pin(ready(self.respond(ClientCall::GetLastTransaction(id), |state| {
            Ok(state.last_transaction.clone())
        })))
    }

    fn power_state(&self, id: GuestId) -> ApiFuture<'_, PowerState> {
        Box::pin(ready(self.respond(ClientCall::GetPowerState(id), |state| {
            Ok(state.power_state.clone())
        })))
    }

    fn upgrade_item_prices(&self, id: GuestId) -> ApiFuture<'_, Vec<ItemPrice>> {
        Box::pin(ready(self.respond(ClientCall::GetUpgradeItemPrices(id), |state| {
            Ok(state.prices.clone())
        })))
    }

    fn place_order<'a>(&'a self, order: &'a UpgradeOrder) -> ApiFuture<'a, OrderReceipt> {
        Box::pin(ready(self.respond(ClientCall::PlaceOrder(order.clone()), |state| {
            state.pending_transactions = 1;
            state.last_transaction = Some(transaction(CLOUD_INSTANCE_UPGRADE, "Complete"));
            Ok(OrderReceipt { order_id: 4242 })
        })))
    }

    fn reload_operating_system(&self, id: GuestId, stemcell: StemcellId) -> ApiFuture<'_, ()> {
        Box::pin(ready(self.respond(
            ClientCall::ReloadOperatingSystem(id, stemcell),
            |state| {
                state.pending_transactions = 1;
                state.last_transaction = Some(transaction(SERVICE_SETUP, "Complete"));
                Ok(())
            },
        )))
    }

    fn reboot_soft(&self, id: GuestId) -> ApiFuture<'_, ()> {
        Box::pin(ready(self.respond(ClientCall::RebootSoft(id), |_| Ok(()))))
    }

    fn set_user_metadata<'a>(&'a self, id: GuestId, metadata: &'a str) -> ApiFuture<'a, ()> {
        Box::pin(ready(self.respond(
            ClientCall::SetUserMetadata(id, metadata.to_owned()),
            |_| Ok(()),
        )))
    }

    fn allow_access_from_virtual_guest(&self, disk: DiskId, guest: GuestId) -> ApiFuture<'_, ()> {
        Box::pin(ready(self.respond(
            ClientCall::AllowAccessFromVirtualGuest(disk, guest),
            |_| Ok(()),
        )))
    }

    fn get_network_storage(&self, id: DiskId) -> LookupFuture<'_, NetworkStorage> {
        Box::pin(ready(self.respond(ClientCall::GetNetworkStorage(id), |state| {
            Ok(state.storage.get(&id).cloned())
        })))
    }

    fn get_image_template(&self, id: StemcellId) -> LookupFuture<'_, ImageTemplate> {
        Box::pin(ready(self.respond(ClientCall::GetImageTemplate(id), |state| {
            Ok(state.templates.get(&id).cloned())
        })))
    }
}

/// [`HostsRegistrar`] that remembers registrations instead of touching files.
#[derive(Clone, Debug, Default)]
pub struct RecordingHosts {
    entries: Arc<StdMutex<Vec<(String, String)>>>,
}

impl RecordingHosts {
    /// Returns `(ip, fqdn)` pairs in registration order.
    #[must_use]
    pub fn entries(&self) -> Vec<(String, String)> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl HostsRegistrar for RecordingHosts {
    fn register_host(&self, ip: &str, fqdn: &str) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((ip.to_owned(), fqdn.to_owned()));
    }
}

/// Builds a guest record.
#[must_use]
pub fn virtual_guest(
    id: u64,
    hostname: &str,
    domain: &str,
    backend_ip: Option<&str>,
    public_ip: Option<&str>,
) -> VirtualGuest {
    VirtualGuest {
        id: GuestId::new(id),
        hostname: hostname.to_owned(),
        domain: domain.to_owned(),
        fully_qualified_domain_name: format!("{hostname}.{domain}"),
        primary_ip_address: public_ip.map(ToOwned::to_owned),
        primary_backend_ip_address: backend_ip.map(ToOwned::to_owned),
    }
}

/// Builds a `guest_disk1` price.
#[must_use]
pub fn disk_price(id: u64, description: &str, capacity_gb: u64) -> ItemPrice {
    ItemPrice {
        id,
        item: Some(Item {
            id: id + 10_000,
            description: description.to_owned(),
            capacity: json!(capacity_gb.to_string()),
        }),
        categories: vec![Category {
            category_code: String::from("guest_disk1"),
        }],
    }
}

/// Builds a transaction record.
#[must_use]
pub fn transaction(group: &str, status: &str) -> Transaction {
    Transaction {
        id: 1,
        transaction_group: Some(TransactionGroup {
            name: group.to_owned(),
        }),
        transaction_status: Some(TransactionStatus {
            name: status.to_uppercase(),
            friendly_name: status.to_owned(),
        }),
    }
}

/// Global mutex used to serialise environment mutation in tests.
pub static ENV_LOCK: Mutex<()> = Mutex::const_new(());

/// Guard that holds the env mutex and cleans up variables on drop.
pub struct EnvGuard {
    previous: Vec<(String, Option<OsString>)>,
    _guard: MutexGuard<'static, ()>,
}

impl EnvGuard {
    /// Sets multiple environment variables while holding a global mutex.
    ///
    /// Variables listed in `cleared` are removed for the guard's lifetime.
    pub async fn set_vars(pairs: &[(&str, &str)], cleared: &[&str]) -> Self {
        debug_assert!(
            {
                let mut seen = BTreeSet::new();
                pairs
                    .iter()
                    .map(|(key, _)| *key)
                    .chain(cleared.iter().copied())
                    .all(|key| seen.insert(key))
            },
            "duplicate environment variable keys passed to EnvGuard::set_vars"
        );

        let guard = ENV_LOCK.lock().await;
        let mut previous = Vec::with_capacity(pairs.len() + cleared.len());
        for (key, value) in pairs {
            previous.push(((*key).to_owned(), env::var_os(key)));
            // SAFETY: Environment mutation is serialised by `ENV_LOCK`, preventing races.
            unsafe { env::set_var(key, value) };
        }
        for key in cleared {
            previous.push(((*key).to_owned(), env::var_os(key)));
            // SAFETY: Environment mutation is serialised by `ENV_LOCK`, preventing races.
            unsafe { env::remove_var(key) };
        }

        Self {
            previous,
            _guard: guard,
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, old) in self.previous.iter().rev() {
            // SAFETY: Environment mutation is serialised by holding `_guard`.
            unsafe {
                match old {
                    Some(val) => env::set_var(key, val),
                    None => env::remove_var(key),
                }
            }
        }
    }
}
