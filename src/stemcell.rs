//! Stemcell lookup.

use crate::softlayer::{SoftLayerClient, StemcellId};
use crate::vm::{VmError, VmFuture};

/// Block device template group guests are booted or reloaded from.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Stemcell {
    /// Template group identifier.
    pub id: StemcellId,
    /// Global identifier used in creation templates.
    pub uuid: String,
}

/// Resolves stemcell identifiers.
pub trait StemcellFinder: Send + Sync {
    /// Looks a stemcell up; `Ok(None)` means it is confirmed absent.
    fn find(&self, id: StemcellId) -> VmFuture<'_, Option<Stemcell>>;
}

/// [`StemcellFinder`] reading `SoftLayer_Virtual_Guest_Block_Device_Template_Group`.
#[derive(Clone, Debug)]
pub struct SoftLayerStemcellFinder<C> {
    client: C,
}

impl<C: SoftLayerClient> SoftLayerStemcellFinder<C> {
    /// Creates a finder that uses `client`.
    #[must_use]
    pub const fn new(client: C) -> Self {
        Self { client }
    }
}

impl<C: SoftLayerClient> StemcellFinder for SoftLayerStemcellFinder<C> {
    fn find(&self, id: StemcellId) -> VmFuture<'_, Option<Stemcell>> {
        Box::pin(async move {
            let template = self
                .client
                .get_image_template(id)
                .await
                .map_err(VmError::transport(format!("finding stemcell {id}")))?;
            Ok(template
                .filter(|group| !group.id.is_zero())
                .map(|group| Stemcell {
                    id: group.id,
                    uuid: group.global_identifier,
                }))
        })
    }
}
