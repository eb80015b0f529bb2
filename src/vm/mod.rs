//! Virtual guest handles, the instance finder and the provisioning orchestrator.
//!
//! A [`Vm`] always mirrors a guest whose existence was confirmed by the call
//! that produced it. Mutators act on the remote record through the client the
//! handle was resolved with.

pub mod agent_env;
mod cloud_properties;
mod creator;
mod ephemeral;
mod error;
pub mod hosts;
mod networks;
mod transactions;

use std::future::Future;
use std::pin::Pin;

use tracing::info;

use crate::disk::Disk;
use crate::softlayer::{GuestId, SoftLayerClient, VirtualGuest};
use crate::stemcell::Stemcell;
use crate::wait::WaitSettings;

pub use agent_env::{AgentEnv, AgentOptions, BlobstoreOptions, DavConfig, Environment};
pub use cloud_properties::CloudProperties;
pub use creator::{CreateStrategy, CreatorWaits, VmCreator};
pub use ephemeral::{select_disk_price, upgrade_order};
pub use error::{CreateError, CreateState, VmError};
pub use hosts::{EtcHostsFile, HostsRegistrar};
pub use networks::{Network, NetworkType, Networks, is_private_address};
pub use transactions::{CLOUD_INSTANCE_UPGRADE, SERVICE_SETUP};

/// Future returned by VM lookups and mutators.
pub type VmFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, VmError>> + Send + 'a>>;

/// Identifier and cached attributes of a virtual guest.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct InstanceHandle {
    /// Guest identifier.
    pub id: GuestId,
    /// Fully qualified domain name.
    pub fqdn: String,
    /// Public address.
    pub primary_ip: Option<String>,
    /// Private backend address.
    pub primary_backend_ip: Option<String>,
}

impl InstanceHandle {
    /// Returns the backend address, ignoring blank values.
    #[must_use]
    pub fn primary_backend_ip(&self) -> Option<&str> {
        self.primary_backend_ip
            .as_deref()
            .filter(|ip| !ip.trim().is_empty())
    }
}

impl From<VirtualGuest> for InstanceHandle {
    fn from(guest: VirtualGuest) -> Self {
        let fqdn = if guest.fully_qualified_domain_name.is_empty() {
            format!("{}.{}", guest.hostname, guest.domain)
        } else {
            guest.fully_qualified_domain_name
        };
        Self {
            id: guest.id,
            fqdn,
            primary_ip: guest.primary_ip_address,
            primary_backend_ip: guest.primary_backend_ip_address,
        }
    }
}

/// A confirmed virtual guest together with the client used to mutate it.
#[derive(Clone, Debug)]
pub struct Vm<C> {
    handle: InstanceHandle,
    client: C,
}

impl<C> PartialEq for Vm<C> {
    fn eq(&self, other: &Self) -> bool {
        self.handle == other.handle
    }
}

impl<C> Eq for Vm<C> {}

impl<C: SoftLayerClient> Vm<C> {
    /// Wraps a handle confirmed through `client`.
    #[must_use]
    pub const fn new(handle: InstanceHandle, client: C) -> Self {
        Self { handle, client }
    }

    /// Returns the guest identifier.
    #[must_use]
    pub const fn id(&self) -> GuestId {
        self.handle.id
    }

    /// Returns the cached attributes.
    #[must_use]
    pub const fn handle(&self) -> &InstanceHandle {
        &self.handle
    }

    /// Replaces the agent environment stored in the guest's user metadata.
    ///
    /// # Errors
    ///
    /// Returns [`VmError::AgentEnvEncoding`] or [`VmError::Transport`].
    pub async fn update_agent_env(&self, agent_env: &AgentEnv) -> Result<(), VmError> {
        let blob = agent_env.encode()?;
        self.client
            .set_user_metadata(self.id(), &blob)
            .await
            .map_err(VmError::transport(format!(
                "updating agent env of virtual guest {}",
                self.id()
            )))
    }

    /// Applies the `vcap` password by pushing the agent environment again
    /// with the password set.
    ///
    /// # Errors
    ///
    /// Returns the same errors as [`Vm::update_agent_env`].
    pub async fn set_vcap_password(
        &self,
        agent_env: &AgentEnv,
        password: &str,
    ) -> Result<(), VmError> {
        self.update_agent_env(&agent_env.with_vcap_password(password))
            .await
    }

    /// Soft-reboots the guest.
    ///
    /// # Errors
    ///
    /// Returns [`VmError::Transport`] when SoftLayer rejects the reboot.
    pub async fn reboot(&self) -> Result<(), VmError> {
        info!(id = %self.id(), "rebooting virtual guest");
        self.client
            .reboot_soft(self.id())
            .await
            .map_err(VmError::transport(format!(
                "rebooting virtual guest {}",
                self.id()
            )))
    }

    /// Authorises the guest on an iSCSI volume.
    ///
    /// # Errors
    ///
    /// Returns [`VmError::Transport`] when SoftLayer rejects the grant.
    pub async fn attach_disk(&self, disk: &Disk) -> Result<(), VmError> {
        info!(id = %self.id(), disk = %disk.id, "attaching disk");
        self.client
            .allow_access_from_virtual_guest(disk.id, self.id())
            .await
            .map_err(VmError::transport(format!(
                "granting virtual guest {} access to disk {}",
                self.id(),
                disk.id
            )))
    }

    /// Re-images the guest from `stemcell` and waits for the reload
    /// transactions to start and finish.
    ///
    /// # Errors
    ///
    /// Returns [`VmError::Transport`] when the reload is rejected and
    /// [`VmError::DeadlineExceeded`] when it does not settle in time.
    pub async fn reload_os(&self, stemcell: &Stemcell, settings: WaitSettings) -> Result<(), VmError> {
        info!(id = %self.id(), stemcell = %stemcell.id, "reloading operating system");
        self.client
            .reload_operating_system(self.id(), stemcell.id)
            .await
            .map_err(VmError::transport(format!(
                "reloading virtual guest {} with stemcell {}",
                self.id(),
                stemcell.id
            )))?;
        transactions::wait_for_active_transactions(&self.client, self.id(), settings).await?;
        transactions::wait_for_no_active_transactions(&self.client, self.id(), settings).await
    }
}

/// Resolves guest identifiers to confirmed [`Vm`] handles.
pub trait VmFinder: Send + Sync {
    /// Client the returned handles mutate through.
    type Client: SoftLayerClient;

    /// Looks a guest up. `Ok(None)` means the guest is confirmed absent;
    /// an error means its existence is unknown.
    fn find(&self, id: GuestId) -> VmFuture<'_, Option<Vm<Self::Client>>>;
}

/// [`VmFinder`] backed by a direct `getObject` lookup.
#[derive(Clone, Debug)]
pub struct SoftLayerVmFinder<C> {
    client: C,
}

impl<C: SoftLayerClient> SoftLayerVmFinder<C> {
    /// Creates a finder that uses `client`.
    #[must_use]
    pub const fn new(client: C) -> Self {
        Self { client }
    }
}

impl<C: SoftLayerClient> VmFinder for SoftLayerVmFinder<C> {
    type Client = C;

    fn find(&self, id: GuestId) -> VmFuture<'_, Option<Vm<C>>> {
        Box::pin(async move {
            let guest = self
                .client
                .get_virtual_guest(id)
                .await
                .map_err(VmError::transport(format!("finding virtual guest {id}")))?;
            Ok(guest
                .filter(|record| !record.id.is_zero())
                .map(|record| Vm::new(InstanceHandle::from(record), self.client.clone())))
        })
    }
}
