//! Director actions layered on the finders and the provisioning orchestrator.
//!
//! Each action resolves the objects it needs, enforces its existence
//! preconditions and delegates one state change.

mod attach_disk;
mod create_vm;
mod error;
mod has_vm;
mod reboot_vm;

pub use attach_disk::AttachDisk;
pub use create_vm::{CreateVm, CreateVmRequest};
pub use error::ActionError;
pub use has_vm::HasVm;
pub use reboot_vm::RebootVm;
