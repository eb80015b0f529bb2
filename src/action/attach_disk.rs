//! `attach_disk` action.

use tracing::info;

use crate::disk::DiskFinder;
use crate::softlayer::{DiskId, GuestId};
use crate::vm::VmFinder;

use super::ActionError;

/// Grants a VM access to a persistent disk. Both must exist.
#[derive(Clone, Debug)]
pub struct AttachDisk<F, D> {
    vm_finder: F,
    disk_finder: D,
}

impl<F: VmFinder, D: DiskFinder> AttachDisk<F, D> {
    /// Creates the action.
    #[must_use]
    pub const fn new(vm_finder: F, disk_finder: D) -> Self {
        Self {
            vm_finder,
            disk_finder,
        }
    }

    /// Attaches `disk_cid` to `vm_cid`.
    ///
    /// # Errors
    ///
    /// Returns [`ActionError::VmNotFound`] or [`ActionError::DiskNotFound`]
    /// when either side is absent, and wraps lookup and mutator failures with
    /// the ids involved.
    pub async fn run(&self, vm_cid: GuestId, disk_cid: DiskId) -> Result<(), ActionError> {
        let vm = self
            .vm_finder
            .find(vm_cid)
            .await
            .map_err(|source| ActionError::FindVm { vm_cid, source })?
            .ok_or(ActionError::VmNotFound { vm_cid })?;

        let disk = self
            .disk_finder
            .find(disk_cid)
            .await
            .map_err(|source| ActionError::FindDisk { disk_cid, source })?
            .ok_or(ActionError::DiskNotFound { disk_cid })?;

        vm.attach_disk(&disk)
            .await
            .map_err(|source| ActionError::AttachDisk {
                vm_cid,
                disk_cid,
                source,
            })?;
        info!(%vm_cid, %disk_cid, "attached disk");
        Ok(())
    }
}
