//! Provisioning orchestrator.
//!
//! A create pass selects a strategy from the first network, obtains a guest
//! id by ordering a new guest or by reloading an existing one, waits for the
//! guest to settle, then injects the agent environment. Both strategies share
//! every step after the id is known. Failures short-circuit without rollback.

use tracing::{debug, info, warn};

use crate::softlayer::{GuestId, SoftLayerClient};
use crate::stemcell::Stemcell;
use crate::wait::WaitSettings;

use super::agent_env::{AgentOptions, Environment, build_bootstrap_payload};
use super::ephemeral::attach_ephemeral_disk;
use super::hosts::HostsRegistrar;
use super::networks::{NetworkType, Networks, is_private_address};
use super::transactions::{SERVICE_SETUP, wait_for_last_transaction};
use super::{CloudProperties, CreateError, CreateState, Vm, VmError, VmFinder};

/// Wait limits used by a [`VmCreator`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct CreatorWaits {
    /// Limits for provisioning and ephemeral disk transactions.
    pub provisioning: WaitSettings,
    /// Limits applied once a guest has been reloaded.
    pub reload: WaitSettings,
}

impl Default for CreatorWaits {
    fn default() -> Self {
        Self {
            provisioning: WaitSettings::default(),
            reload: WaitSettings::reload(),
        }
    }
}

impl CreatorWaits {
    /// Uses `settings` for every wait.
    #[must_use]
    pub const fn uniform(settings: WaitSettings) -> Self {
        Self {
            provisioning: settings,
            reload: settings,
        }
    }
}

/// How a create pass obtains its guest.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum CreateStrategy {
    /// Order a new guest.
    Allocate,
    /// Reload the guest that owns `ip`.
    Reimage {
        /// Address identifying the guest.
        ip: String,
    },
}

impl CreateStrategy {
    /// Chooses the strategy from the first network by name.
    ///
    /// # Errors
    ///
    /// Returns [`VmError::Validation`] when no network is given and
    /// [`VmError::UnsupportedNetworkType`] for anything but `dynamic`.
    pub fn select(networks: &Networks) -> Result<Self, VmError> {
        let Some((name, network)) = networks.first() else {
            return Err(VmError::Validation(String::from(
                "at least one network is required",
            )));
        };

        match &network.network_type {
            NetworkType::Dynamic => {
                debug!(network = name, "strategy network is dynamic");
                Ok(network.ip().map_or(Self::Allocate, |ip| Self::Reimage {
                    ip: ip.to_owned(),
                }))
            }
            other => Err(VmError::UnsupportedNetworkType {
                network_type: other.as_str().to_owned(),
            }),
        }
    }
}

fn at(step: CreateState) -> impl FnOnce(VmError) -> CreateError {
    move |error| {
        warn!(%step, %error, state = %CreateState::Failed, "virtual guest creation failed");
        CreateError { step, error }
    }
}

/// Creates virtual guests ready for the director.
pub struct VmCreator<F: VmFinder, H> {
    client: F::Client,
    finder: F,
    hosts: H,
    agent_options: AgentOptions,
    waits: CreatorWaits,
}

impl<F, H> VmCreator<F, H>
where
    F: VmFinder,
    H: HostsRegistrar,
{
    /// Assembles a creator from its collaborators.
    #[must_use]
    pub const fn new(
        client: F::Client,
        finder: F,
        hosts: H,
        agent_options: AgentOptions,
        waits: CreatorWaits,
    ) -> Self {
        Self {
            client,
            finder,
            hosts,
            agent_options,
            waits,
        }
    }

    /// Runs one create pass.
    ///
    /// Request validation happens before any remote call. The returned guest
    /// was looked up again after provisioning settled.
    ///
    /// # Errors
    ///
    /// Returns a [`CreateError`] naming the step that failed.
    pub async fn create(
        &self,
        agent_id: &str,
        stemcell: &Stemcell,
        cloud_props: &CloudProperties,
        networks: &Networks,
        env: &Environment,
    ) -> Result<Vm<F::Client>, CreateError> {
        let strategy = CreateStrategy::select(networks)
            .and_then(|strategy| cloud_props.validate().map(|()| strategy))
            .map_err(at(CreateState::SelectingStrategy))?;
        info!(agent_id, ?strategy, stemcell = %stemcell.id, "selected creation strategy");

        let (id, settings) = match strategy {
            CreateStrategy::Allocate => {
                let id = self
                    .allocate(stemcell, cloud_props)
                    .await
                    .map_err(at(CreateState::Allocating))?;
                (id, self.waits.provisioning)
            }
            CreateStrategy::Reimage { ip } => {
                let vm = self
                    .resolve_reimage_target(&ip)
                    .await
                    .map_err(at(CreateState::Allocating))?;
                vm.reload_os(stemcell, self.waits.reload)
                    .await
                    .map_err(at(CreateState::AwaitingCompletion))?;
                (vm.id(), self.waits.reload)
            }
        };

        self.await_provisioning(id, cloud_props, settings).await?;

        let vm = self
            .must_find(id)
            .await
            .map_err(at(CreateState::InjectingAgentEnv))?;
        self.inject_agent_env(&vm, agent_id, cloud_props, networks, env)
            .await
            .map_err(at(CreateState::InjectingAgentEnv))?;

        info!(%id, agent_id, state = %CreateState::Ready, "virtual guest ready");
        Ok(vm)
    }

    async fn allocate(
        &self,
        stemcell: &Stemcell,
        cloud_props: &CloudProperties,
    ) -> Result<GuestId, VmError> {
        let template = cloud_props.virtual_guest_template(stemcell);
        let guest = self
            .client
            .create_virtual_guest(&template)
            .await
            .map_err(VmError::transport("creating virtual guest"))?;
        info!(id = %guest.id, hostname = %template.hostname, "ordered virtual guest");
        Ok(guest.id)
    }

    async fn resolve_reimage_target(&self, ip: &str) -> Result<Vm<F::Client>, VmError> {
        let lookup = if is_private_address(ip) {
            self.client.find_by_primary_backend_ip(ip)
        } else {
            self.client.find_by_primary_ip(ip)
        };
        let id = lookup
            .await
            .map_err(VmError::transport(format!(
                "looking up virtual guest by IP address {ip}"
            )))?
            .map(|guest| guest.id)
            .filter(|id| !id.is_zero())
            .ok_or_else(|| VmError::InstanceNotFound { ip: ip.to_owned() })?;
        info!(%id, ip, "re-imaging existing virtual guest");
        self.must_find(id).await
    }

    async fn await_provisioning(
        &self,
        id: GuestId,
        cloud_props: &CloudProperties,
        settings: WaitSettings,
    ) -> Result<(), CreateError> {
        let size_gb = cloud_props.ephemeral_disk_size;
        if size_gb == 0 {
            debug!(%id, state = %CreateState::AwaitingCompletion, "waiting for service setup");
            return wait_for_last_transaction(&self.client, id, SERVICE_SETUP, settings)
                .await
                .map_err(at(CreateState::AwaitingCompletion));
        }

        debug!(%id, size_gb, state = %CreateState::AttachingDisk, "ordering ephemeral disk");
        attach_ephemeral_disk(&self.client, id, size_gb, cloud_props.disk_kind(), settings)
            .await
            .map_err(at(CreateState::AttachingDisk))
    }

    async fn must_find(&self, id: GuestId) -> Result<Vm<F::Client>, VmError> {
        self.finder
            .find(id)
            .await?
            .ok_or_else(|| VmError::HandleResolutionFailed {
                id,
                reason: String::from("virtual guest not found"),
            })
    }

    async fn inject_agent_env(
        &self,
        vm: &Vm<F::Client>,
        agent_id: &str,
        cloud_props: &CloudProperties,
        networks: &Networks,
        env: &Environment,
    ) -> Result<(), VmError> {
        let payload = build_bootstrap_payload(
            agent_id,
            vm.handle(),
            cloud_props,
            networks,
            env,
            &self.agent_options,
            &self.hosts,
        )?;
        vm.update_agent_env(&payload).await?;

        if let Some(password) = self.agent_options.vcap_password() {
            vm.set_vcap_password(&payload, password).await?;
        }
        Ok(())
    }
}
