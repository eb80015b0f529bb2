//! Error types for director actions.

use thiserror::Error;

use crate::softlayer::{DiskId, GuestId, StemcellId};
use crate::vm::{CreateError, VmError};

/// Errors raised by director actions, carrying the ids involved.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ActionError {
    /// Raised when a VM lookup fails.
    #[error("finding VM '{vm_cid}': {source}")]
    FindVm {
        /// VM cid.
        vm_cid: GuestId,
        /// Lookup failure.
        source: VmError,
    },
    /// Raised when an action requires a VM that does not exist.
    #[error("expected to find VM '{vm_cid}'")]
    VmNotFound {
        /// VM cid.
        vm_cid: GuestId,
    },
    /// Raised when a disk lookup fails.
    #[error("finding disk '{disk_cid}': {source}")]
    FindDisk {
        /// Disk cid.
        disk_cid: DiskId,
        /// Lookup failure.
        source: VmError,
    },
    /// Raised when an action requires a disk that does not exist.
    #[error("expected to find disk '{disk_cid}'")]
    DiskNotFound {
        /// Disk cid.
        disk_cid: DiskId,
    },
    /// Raised when the attach mutator fails.
    #[error("attaching disk '{disk_cid}' to VM '{vm_cid}': {source}")]
    AttachDisk {
        /// VM cid.
        vm_cid: GuestId,
        /// Disk cid.
        disk_cid: DiskId,
        /// Mutator failure.
        source: VmError,
    },
    /// Raised when the reboot mutator fails.
    #[error("rebooting VM '{vm_cid}': {source}")]
    Reboot {
        /// VM cid.
        vm_cid: GuestId,
        /// Mutator failure.
        source: VmError,
    },
    /// Raised when a stemcell lookup fails.
    #[error("finding stemcell '{stemcell_cid}': {source}")]
    FindStemcell {
        /// Stemcell cid.
        stemcell_cid: StemcellId,
        /// Lookup failure.
        source: VmError,
    },
    /// Raised when a create request names an unknown stemcell.
    #[error("expected to find stemcell '{stemcell_cid}'")]
    StemcellNotFound {
        /// Stemcell cid.
        stemcell_cid: StemcellId,
    },
    /// Raised when the orchestrator fails.
    #[error("creating VM with stemcell '{stemcell_cid}': {source}")]
    CreateVm {
        /// Stemcell cid.
        stemcell_cid: StemcellId,
        /// Orchestrator failure.
        source: CreateError,
    },
}
