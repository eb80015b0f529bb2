//! Core library for the SoftLayer cloud provider interface.
//!
//! The crate provisions SoftLayer virtual guests for a BOSH director. A create
//! request either orders a new guest or re-images an existing one, waits for
//! its transactions to settle, optionally attaches an ephemeral disk, and
//! pushes the agent bootstrap payload as user metadata. Lifecycle actions
//! layer existence checks over the finders; [`Dispatcher`] routes director
//! requests to them.

pub mod action;
pub mod config;
pub mod disk;
pub mod dispatch;
mod fs_util;
pub mod softlayer;
pub mod stemcell;
pub mod test_support;
pub mod vm;
pub mod wait;

pub use action::{ActionError, AttachDisk, CreateVm, CreateVmRequest, HasVm, RebootVm};
pub use config::{ConfigError, SoftLayerConfig};
pub use disk::{Disk, DiskFinder, SoftLayerDiskFinder};
pub use dispatch::{DispatchError, Dispatcher, Request, Response, ResponseError};
pub use softlayer::{HttpSoftLayerClient, SoftLayerClient, SoftLayerError};
pub use stemcell::{SoftLayerStemcellFinder, Stemcell, StemcellFinder};
pub use vm::{
    AgentOptions, CreateError, CreateState, CreatorWaits, InstanceHandle, SoftLayerVmFinder, Vm,
    VmCreator, VmError, VmFinder,
};
pub use wait::{DeadlineExceeded, WaitSettings, wait_until};
