//! Ephemeral disk ordering for freshly provisioned or reloaded guests.

use tracing::info;

use crate::softlayer::types::{Category, IdRef, OrderPrice, OrderProperty};
use crate::softlayer::{GuestId, ItemPrice, SoftLayerClient, UpgradeOrder};
use crate::wait::WaitSettings;

use super::VmError;
use super::transactions::{
    CLOUD_INSTANCE_UPGRADE, wait_for_active_transactions, wait_for_last_transaction,
    wait_for_no_active_transactions, wait_for_power_on,
};

/// Category of the second guest disk.
pub const EPHEMERAL_DISK_CATEGORY: &str = "guest_disk1";
const UPGRADE_ORDER_TYPE: &str = "SoftLayer_Container_Product_Order_Virtual_Guest_Upgrade";

/// Picks the cheapest fitting disk price: the smallest `guest_disk1` price of
/// the requested kind (`LOCAL` or `SAN`) holding at least `size_gb`.
#[must_use]
pub fn select_disk_price<'a>(
    prices: &'a [ItemPrice],
    size_gb: u64,
    disk_kind: &str,
) -> Option<&'a ItemPrice> {
    let marker = format!("({disk_kind})");
    prices
        .iter()
        .filter(|price| price.in_category(EPHEMERAL_DISK_CATEGORY))
        .filter_map(|price| {
            let item = price.item.as_ref()?;
            let capacity = item.capacity_gb()?;
            (item.description.contains(&marker) && capacity >= size_gb).then_some((capacity, price))
        })
        .min_by_key(|(capacity, _)| *capacity)
        .map(|(_, price)| price)
}

/// Builds the upgrade order adding the disk priced by `price_id` to guest `id`.
#[must_use]
pub fn upgrade_order(id: GuestId, price_id: u64) -> UpgradeOrder {
    UpgradeOrder {
        complex_type: UPGRADE_ORDER_TYPE.to_owned(),
        virtual_guests: vec![IdRef { id: id.get() }],
        prices: vec![OrderPrice {
            id: price_id,
            categories: vec![Category {
                category_code: EPHEMERAL_DISK_CATEGORY.to_owned(),
            }],
        }],
        properties: vec![OrderProperty {
            name: String::from("NOTE_GENERAL"),
            value: String::from("addingdisks"),
        }],
    }
}

/// Orders an ephemeral disk and waits until the guest is back online.
///
/// Any failure is reported as [`VmError::EphemeralDiskAttachFailed`].
pub(crate) async fn attach_ephemeral_disk<C: SoftLayerClient>(
    client: &C,
    id: GuestId,
    size_gb: u64,
    disk_kind: &str,
    settings: WaitSettings,
) -> Result<(), VmError> {
    order_and_settle(client, id, size_gb, disk_kind, settings)
        .await
        .map_err(|source| VmError::EphemeralDiskAttachFailed {
            id,
            size_gb,
            source: Box::new(source),
        })
}

async fn order_and_settle<C: SoftLayerClient>(
    client: &C,
    id: GuestId,
    size_gb: u64,
    disk_kind: &str,
    settings: WaitSettings,
) -> Result<(), VmError> {
    wait_for_no_active_transactions(client, id, settings).await?;

    let prices = client
        .upgrade_item_prices(id)
        .await
        .map_err(VmError::transport(format!(
            "getting upgrade item prices of virtual guest {id}"
        )))?;
    let price = select_disk_price(&prices, size_gb, disk_kind).ok_or_else(|| {
        VmError::UpgradePriceUnavailable {
            disk_kind: disk_kind.to_owned(),
            size_gb,
        }
    })?;

    let order = upgrade_order(id, price.id);
    let receipt = client
        .place_order(&order)
        .await
        .map_err(VmError::transport(format!(
            "placing ephemeral disk order for virtual guest {id}"
        )))?;
    info!(%id, size_gb, price_id = price.id, order_id = receipt.order_id, "placed ephemeral disk order");

    wait_for_active_transactions(client, id, settings).await?;
    wait_for_no_active_transactions(client, id, settings).await?;
    wait_for_last_transaction(client, id, CLOUD_INSTANCE_UPGRADE, settings).await?;
    wait_for_power_on(client, id, settings).await
}
