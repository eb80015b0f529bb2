//! Error types for VM provisioning and instance mutators.

use std::fmt;

use thiserror::Error;

use crate::softlayer::{GuestId, SoftLayerError};
use crate::wait::DeadlineExceeded;

/// Errors raised while creating or mutating a virtual guest.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum VmError {
    /// Raised when cloud properties or networks are structurally invalid.
    #[error("invalid VM request: {0}")]
    Validation(String),
    /// Raised when the strategy network has a type other than `dynamic`.
    #[error("{}", unsupported_network_message(.network_type))]
    UnsupportedNetworkType {
        /// Network type as given by the director.
        network_type: String,
    },
    /// Raised when no guest owns the address of a re-image request.
    #[error("no virtual guest found with IP address {ip}")]
    InstanceNotFound {
        /// Address that was looked up.
        ip: String,
    },
    /// Raised when a guest disappears between provisioning and agent injection.
    #[error("virtual guest {id} could not be resolved: {reason}")]
    HandleResolutionFailed {
        /// Guest identifier.
        id: GuestId,
        /// Why resolution failed.
        reason: String,
    },
    /// Wrapper for SoftLayer API failures.
    #[error("{operation}: {source}")]
    Transport {
        /// Remote operation that failed.
        operation: String,
        /// Underlying API error.
        source: SoftLayerError,
    },
    /// Raised when a transaction wait times out.
    #[error(transparent)]
    DeadlineExceeded(#[from] DeadlineExceeded),
    /// Raised when the ephemeral disk sequence fails at any step.
    #[error("attaching {size_gb} GB ephemeral disk to virtual guest {id}: {source}")]
    EphemeralDiskAttachFailed {
        /// Guest identifier.
        id: GuestId,
        /// Requested size in gigabytes.
        size_gb: u64,
        /// Step failure.
        source: Box<VmError>,
    },
    /// Raised when no orderable price fits the requested ephemeral disk.
    #[error("no {disk_kind} guest_disk1 upgrade price of at least {size_gb} GB")]
    UpgradePriceUnavailable {
        /// `LOCAL` or `SAN`.
        disk_kind: String,
        /// Requested size in gigabytes.
        size_gb: u64,
    },
    /// Raised when the message bus template cannot be rewritten.
    #[error("invalid mbus configuration: {reason}")]
    InvalidMbusConfig {
        /// Parse failure description.
        reason: String,
    },
    /// Raised when blobstore options cannot be interpreted.
    #[error("invalid blobstore configuration: {reason}")]
    InvalidBlobstoreConfig {
        /// Parse failure description.
        reason: String,
    },
    /// Raised when the agent environment cannot be serialised.
    #[error("encoding agent environment: {0}")]
    AgentEnvEncoding(String),
}

fn unsupported_network_message(network_type: &str) -> String {
    match network_type {
        "manual" => String::from("Manual networking is not currently supported"),
        "vip" => String::from("SoftLayer does not support VIP networks"),
        "" => String::from("SoftLayer does not support networks without a type"),
        other => format!("SoftLayer does not support this kind of network: {other}"),
    }
}

impl VmError {
    /// Returns a mapper that wraps a [`SoftLayerError`] with the operation name.
    #[must_use]
    pub fn transport(name: impl Into<String>) -> impl FnOnce(SoftLayerError) -> Self {
        let operation = name.into();
        move |source| Self::Transport { operation, source }
    }
}

/// Step of the create state machine.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CreateState {
    /// Validating the request and choosing between allocation and re-image.
    SelectingStrategy,
    /// Ordering a new guest or resolving the guest to re-image.
    Allocating,
    /// Waiting for provisioning or reload transactions.
    AwaitingCompletion,
    /// Ordering and awaiting the ephemeral disk upgrade.
    AttachingDisk,
    /// Building and pushing the agent environment.
    InjectingAgentEnv,
    /// The guest is ready for use.
    Ready,
    /// A previous step failed.
    Failed,
}

impl fmt::Display for CreateState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::SelectingStrategy => "selecting creation strategy",
            Self::Allocating => "allocating virtual guest",
            Self::AwaitingCompletion => "awaiting provisioning",
            Self::AttachingDisk => "attaching ephemeral disk",
            Self::InjectingAgentEnv => "injecting agent environment",
            Self::Ready => "ready",
            Self::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// Failure of a create pass, tagged with the step that failed.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("{step}: {error}")]
pub struct CreateError {
    /// Step that was running.
    pub step: CreateState,
    /// Underlying error.
    pub error: VmError,
}
