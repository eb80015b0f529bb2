//! `create_vm` action.

use tracing::debug;

use crate::softlayer::{DiskId, GuestId, StemcellId};
use crate::stemcell::StemcellFinder;
use crate::vm::{CloudProperties, Environment, HostsRegistrar, Networks, VmCreator, VmFinder};

use super::ActionError;

/// Resolves the stemcell and runs the provisioning orchestrator.
pub struct CreateVm<S, F: VmFinder, H> {
    stemcell_finder: S,
    creator: VmCreator<F, H>,
}

/// Arguments of a `create_vm` request.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct CreateVmRequest {
    /// Agent identifier assigned by the director.
    pub agent_id: String,
    /// Stemcell to boot from.
    pub stemcell_cid: StemcellId,
    /// Requested guest shape.
    pub cloud_properties: CloudProperties,
    /// Requested networks.
    pub networks: Networks,
    /// Disks the VM should be placed near; SoftLayer offers no placement hint.
    pub disk_cids: Vec<DiskId>,
    /// Director `env` document.
    pub env: Environment,
}

impl<S, F, H> CreateVm<S, F, H>
where
    S: StemcellFinder,
    F: VmFinder,
    H: HostsRegistrar,
{
    /// Creates the action.
    #[must_use]
    pub const fn new(stemcell_finder: S, creator: VmCreator<F, H>) -> Self {
        Self {
            stemcell_finder,
            creator,
        }
    }

    /// Creates a VM and returns its cid.
    ///
    /// # Errors
    ///
    /// Returns [`ActionError::StemcellNotFound`] for an unknown stemcell and
    /// [`ActionError::CreateVm`] when provisioning fails.
    pub async fn run(&self, request: &CreateVmRequest) -> Result<GuestId, ActionError> {
        let stemcell_cid = request.stemcell_cid;
        let stemcell = self
            .stemcell_finder
            .find(stemcell_cid)
            .await
            .map_err(|source| ActionError::FindStemcell {
                stemcell_cid,
                source,
            })?
            .ok_or(ActionError::StemcellNotFound { stemcell_cid })?;

        if !request.disk_cids.is_empty() {
            debug!(disks = ?request.disk_cids, "ignoring disk locality hint");
        }

        let vm = self
            .creator
            .create(
                &request.agent_id,
                &stemcell,
                &request.cloud_properties,
                &request.networks,
                &request.env,
            )
            .await
            .map_err(|source| ActionError::CreateVm {
                stemcell_cid,
                source,
            })?;
        Ok(vm.id())
    }
}
