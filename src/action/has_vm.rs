//! `has_vm` action.

use crate::softlayer::GuestId;
use crate::vm::VmFinder;

use super::ActionError;

/// Reports whether a VM exists.
#[derive(Clone, Debug)]
pub struct HasVm<F> {
    vm_finder: F,
}

impl<F: VmFinder> HasVm<F> {
    /// Creates the action.
    #[must_use]
    pub const fn new(vm_finder: F) -> Self {
        Self { vm_finder }
    }

    /// Returns `true` when `vm_cid` exists.
    ///
    /// # Errors
    ///
    /// Returns [`ActionError::FindVm`] when existence cannot be determined.
    pub async fn run(&self, vm_cid: GuestId) -> Result<bool, ActionError> {
        self.vm_finder
            .find(vm_cid)
            .await
            .map(|found| found.is_some())
            .map_err(|source| ActionError::FindVm { vm_cid, source })
    }
}
