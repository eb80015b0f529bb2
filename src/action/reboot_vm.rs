//! `reboot_vm` action.

use tracing::info;

use crate::softlayer::GuestId;
use crate::vm::VmFinder;

use super::ActionError;

/// Soft-reboots a VM. Rebooting a VM that no longer exists succeeds.
#[derive(Clone, Debug)]
pub struct RebootVm<F> {
    vm_finder: F,
}

impl<F: VmFinder> RebootVm<F> {
    /// Creates the action.
    #[must_use]
    pub const fn new(vm_finder: F) -> Self {
        Self { vm_finder }
    }

    /// Reboots `vm_cid` if it exists.
    ///
    /// # Errors
    ///
    /// Returns [`ActionError::FindVm`] when the lookup fails and
    /// [`ActionError::Reboot`] when SoftLayer rejects the reboot.
    pub async fn run(&self, vm_cid: GuestId) -> Result<(), ActionError> {
        let found = self
            .vm_finder
            .find(vm_cid)
            .await
            .map_err(|source| ActionError::FindVm { vm_cid, source })?;

        let Some(vm) = found else {
            info!(%vm_cid, "VM not found; nothing to reboot");
            return Ok(());
        };

        vm.reboot()
            .await
            .map_err(|source| ActionError::Reboot { vm_cid, source })
    }
}
