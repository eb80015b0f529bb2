//! Persistent disk lookup.

use tracing::debug;

use crate::softlayer::{DiskId, SoftLayerClient};
use crate::vm::{VmError, VmFuture};

/// iSCSI volume backing a persistent disk.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Disk {
    /// Volume identifier.
    pub id: DiskId,
    /// Size in gigabytes.
    pub size_gb: u64,
}

/// Resolves disk identifiers.
pub trait DiskFinder: Send + Sync {
    /// Looks a disk up; `Ok(None)` means it is confirmed absent.
    fn find(&self, id: DiskId) -> VmFuture<'_, Option<Disk>>;
}

/// [`DiskFinder`] reading `SoftLayer_Network_Storage`.
#[derive(Clone, Debug)]
pub struct SoftLayerDiskFinder<C> {
    client: C,
}

impl<C: SoftLayerClient> SoftLayerDiskFinder<C> {
    /// Creates a finder that uses `client`.
    #[must_use]
    pub const fn new(client: C) -> Self {
        Self { client }
    }
}

impl<C: SoftLayerClient> DiskFinder for SoftLayerDiskFinder<C> {
    fn find(&self, id: DiskId) -> VmFuture<'_, Option<Disk>> {
        Box::pin(async move {
            let storage = self
                .client
                .get_network_storage(id)
                .await
                .map_err(VmError::transport(format!("finding disk {id}")))?;
            debug!(%id, found = storage.is_some(), "looked up disk");
            Ok(storage
                .filter(|volume| !volume.id.is_zero())
                .map(|volume| Disk {
                    id: volume.id,
                    size_gb: volume.capacity_gb,
                }))
        })
    }
}
