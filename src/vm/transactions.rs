//! Waits over SoftLayer provisioning transactions and power state.
//!
//! Transaction records are only read inside these predicates and never kept
//! beyond a single poll.

use tracing::debug;

use crate::softlayer::{GuestId, SoftLayerClient, Transaction};
use crate::wait::{WaitSettings, wait_until};

use super::VmError;

/// Transaction group that finishes initial provisioning and OS reloads.
pub const SERVICE_SETUP: &str = "Service Setup";
/// Transaction group that finishes an upgrade order.
pub const CLOUD_INSTANCE_UPGRADE: &str = "Cloud Instance Upgrade";

/// Waits until the guest's last transaction belongs to `group` and has completed.
pub(crate) async fn wait_for_last_transaction<C: SoftLayerClient>(
    client: &C,
    id: GuestId,
    group: &str,
    settings: WaitSettings,
) -> Result<(), VmError> {
    let action = format!("virtual guest {id} {group} transaction to complete");
    wait_until(settings, &action, move || async move {
        let last = client
            .last_transaction(id)
            .await
            .map_err(VmError::transport(format!(
                "getting last transaction of virtual guest {id}"
            )))?;
        debug!(%id, group = last.as_ref().map(Transaction::group_name), "polled last transaction");
        Ok(last.is_some_and(|tx| tx.is_complete_in_group(group)))
    })
    .await
}

/// Waits until at least one transaction is running against the guest.
pub(crate) async fn wait_for_active_transactions<C: SoftLayerClient>(
    client: &C,
    id: GuestId,
    settings: WaitSettings,
) -> Result<(), VmError> {
    let action = format!("virtual guest {id} to start a transaction");
    wait_until(settings, &action, move || async move {
        Ok(!active_transactions(client, id).await?.is_empty())
    })
    .await
}

/// Waits until no transaction is running against the guest.
pub(crate) async fn wait_for_no_active_transactions<C: SoftLayerClient>(
    client: &C,
    id: GuestId,
    settings: WaitSettings,
) -> Result<(), VmError> {
    let action = format!("virtual guest {id} to finish its active transactions");
    wait_until(settings, &action, move || async move {
        Ok(active_transactions(client, id).await?.is_empty())
    })
    .await
}

/// Waits until the guest reports the `RUNNING` power state.
pub(crate) async fn wait_for_power_on<C: SoftLayerClient>(
    client: &C,
    id: GuestId,
    settings: WaitSettings,
) -> Result<(), VmError> {
    let action = format!("virtual guest {id} to power on");
    wait_until(settings, &action, move || async move {
        let state = client
            .power_state(id)
            .await
            .map_err(VmError::transport(format!(
                "getting power state of virtual guest {id}"
            )))?;
        Ok(state.is_running())
    })
    .await
}

async fn active_transactions<C: SoftLayerClient>(
    client: &C,
    id: GuestId,
) -> Result<Vec<Transaction>, VmError> {
    client
        .active_transactions(id)
        .await
        .map_err(VmError::transport(format!(
            "listing active transactions of virtual guest {id}"
        )))
}
