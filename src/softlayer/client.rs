//! REST client for the SoftLayer v3 API.

use std::sync::LazyLock;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use super::types::{
    DiskId, GuestId, ImageTemplate, ItemPrice, NetworkStorage, OrderReceipt, PowerState,
    StemcellId, Transaction, UpgradeOrder, VirtualGuest, VirtualGuestTemplate,
};
use super::{ApiFuture, LookupFuture, SoftLayerClient, SoftLayerError};

/// Public REST endpoint used when no override is configured.
pub const DEFAULT_API_ENDPOINT: &str = "https://api.softlayer.com/rest/v3";

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);
const GUEST_MASK: &str = "id;hostname;domain;fullyQualifiedDomainName;primaryIpAddress;primaryBackendIpAddress";
const TRANSACTION_MASK: &str = "id;transactionGroup.name;transactionStatus.name;transactionStatus.friendlyName";
const PRICE_MASK: &str = "id;categories.categoryCode;item.id;item.description;item.capacity";
const OBJECT_NOT_FOUND: &str = "SoftLayer_Exception_ObjectNotFound";

static HTTP_CLIENT: LazyLock<reqwest::Client> = LazyLock::new(|| {
    reqwest::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
});

/// [`SoftLayerClient`] backed by the SoftLayer REST API.
#[derive(Clone, Debug)]
pub struct HttpSoftLayerClient {
    endpoint: String,
    username: String,
    api_key: String,
}

impl HttpSoftLayerClient {
    /// Builds a client for `endpoint` authenticating with `username` and `api_key`.
    #[must_use]
    pub fn new(
        endpoint: impl Into<String>,
        username: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into().trim_end_matches('/').to_owned(),
            username: username.into(),
            api_key: api_key.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}.json", self.endpoint)
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, SoftLayerError> {
        let request = HTTP_CLIENT
            .get(self.url(path))
            .basic_auth(&self.username, Some(&self.api_key))
            .query(query);
        Self::send(path, request).await
    }

    async fn post<T: DeserializeOwned, P: Serialize + Sync>(
        &self,
        path: &str,
        parameters: &P,
    ) -> Result<T, SoftLayerError> {
        let request = HTTP_CLIENT
            .post(self.url(path))
            .basic_auth(&self.username, Some(&self.api_key))
            .json(&json!({ "parameters": parameters }));
        Self::send(path, request).await
    }

    async fn send<T: DeserializeOwned>(
        path: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<T, SoftLayerError> {
        let response = request.send().await.map_err(|err| SoftLayerError::Http {
            path: path.to_owned(),
            message: err.to_string(),
        })?;
        let status = response.status();
        let body = response.text().await.map_err(|err| SoftLayerError::Http {
            path: path.to_owned(),
            message: err.to_string(),
        })?;

        if !status.is_success() {
            return Err(classify_failure(path, status.as_u16(), &body));
        }

        serde_json::from_str(&body).map_err(|err| SoftLayerError::Decode {
            path: path.to_owned(),
            message: err.to_string(),
        })
    }

    async fn find_guest_by(
        &self,
        field: &str,
        ip: &str,
    ) -> Result<Option<VirtualGuest>, SoftLayerError> {
        let filter = json!({ "virtualGuests": { field: { "operation": ip } } });
        let guests: Vec<VirtualGuest> = self
            .get(
                "SoftLayer_Account/getVirtualGuests",
                &[
                    ("objectMask", GUEST_MASK.to_owned()),
                    ("objectFilter", filter.to_string()),
                ],
            )
            .await?;
        Ok(guests.into_iter().next())
    }
}

fn classify_failure(path: &str, status: u16, body: &str) -> SoftLayerError {
    let payload: Value = serde_json::from_str(body).unwrap_or(Value::Null);
    let code = payload.get("code").and_then(Value::as_str).unwrap_or_default();
    if status == 404 || code == OBJECT_NOT_FOUND {
        return SoftLayerError::NotFound {
            path: path.to_owned(),
        };
    }
    let message = payload
        .get("error")
        .and_then(Value::as_str)
        .map_or_else(|| body.trim().to_owned(), ToOwned::to_owned);
    SoftLayerError::Api {
        path: path.to_owned(),
        status,
        message,
    }
}

fn absent_when_not_found<T>(result: Result<T, SoftLayerError>) -> Result<Option<T>, SoftLayerError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(err) if err.is_not_found() => Ok(None),
        Err(err) => Err(err),
    }
}

impl SoftLayerClient for HttpSoftLayerClient {
    fn create_virtual_guest<'a>(
        &'a self,
        template: &'a VirtualGuestTemplate,
    ) -> ApiFuture<'a, VirtualGuest> {
        Box::pin(async move {
            self.post("SoftLayer_Virtual_Guest/createObject", &[template])
                .await
        })
    }

    fn get_virtual_guest(&self, id: GuestId) -> LookupFuture<'_, VirtualGuest> {
        Box::pin(async move {
            let path = format!("SoftLayer_Virtual_Guest/{id}/getObject");
            absent_when_not_found(
                self.get(&path, &[("objectMask", GUEST_MASK.to_owned())])
                    .await,
            )
        })
    }

    fn find_by_primary_backend_ip<'a>(&'a self, ip: &'a str) -> LookupFuture<'a, VirtualGuest> {
        Box::pin(self.find_guest_by("primaryBackendIpAddress", ip))
    }

    fn find_by_primary_ip<'a>(&'a self, ip: &'a str) -> LookupFuture<'a, VirtualGuest> {
        Box::pin(self.find_guest_by("primaryIpAddress", ip))
    }

    fn active_transactions(&self, id: GuestId) -> ApiFuture<'_, Vec<Transaction>> {
        Box::pin(async move {
            let path = format!("SoftLayer_Virtual_Guest/{id}/getActiveTransactions");
            self.get(&path, &[("objectMask", TRANSACTION_MASK.to_owned())])
                .await
        })
    }

    fn last_transaction(&self, id: GuestId) -> LookupFuture<'_, Transaction> {
        Box::pin(async move {
            let path = format!("SoftLayer_Virtual_Guest/{id}/getLastTransaction");
            self.get(&path, &[("objectMask", TRANSACTION_MASK.to_owned())])
                .await
        })
    }

    fn power_state(&self, id: GuestId) -> ApiFuture<'_, PowerState> {
        Box::pin(async move {
            let path = format!("SoftLayer_Virtual_Guest/{id}/getPowerState");
            self.get(&path, &[]).await
        })
    }

    fn upgrade_item_prices(&self, id: GuestId) -> ApiFuture<'_, Vec<ItemPrice>> {
        Box::pin(async move {
            let path = format!("SoftLayer_Virtual_Guest/{id}/getUpgradeItemPrices");
            self.get(&path, &[("objectMask", PRICE_MASK.to_owned())])
                .await
        })
    }

    fn place_order<'a>(&'a self, order: &'a UpgradeOrder) -> ApiFuture<'a, OrderReceipt> {
        Box::pin(async move { self.post("SoftLayer_Product_Order/placeOrder", &[order]).await })
    }

    fn reload_operating_system(&self, id: GuestId, stemcell: StemcellId) -> ApiFuture<'_, ()> {
        Box::pin(async move {
            let path = format!("SoftLayer_Virtual_Guest/{id}/reloadOperatingSystem");
            let parameters = json!(["FORCE", { "imageTemplateId": stemcell }]);
            self.post(&path, &parameters).await.map(|_: Value| ())
        })
    }

    fn reboot_soft(&self, id: GuestId) -> ApiFuture<'_, ()> {
        Box::pin(async move {
            let path = format!("SoftLayer_Virtual_Guest/{id}/rebootSoft");
            self.get(&path, &[]).await.map(|_: Value| ())
        })
    }

    fn set_user_metadata<'a>(&'a self, id: GuestId, metadata: &'a str) -> ApiFuture<'a, ()> {
        Box::pin(async move {
            let path = format!("SoftLayer_Virtual_Guest/{id}/setUserMetadata");
            self.post(&path, &json!([[metadata]])).await.map(|_: Value| ())
        })
    }

    fn allow_access_from_virtual_guest(&self, disk: DiskId, guest: GuestId) -> ApiFuture<'_, ()> {
        Box::pin(async move {
            let path = format!("SoftLayer_Network_Storage/{disk}/allowAccessFromVirtualGuest");
            self.post(&path, &json!([{ "id": guest }]))
                .await
                .map(|_: Value| ())
        })
    }

    fn get_network_storage(&self, id: DiskId) -> LookupFuture<'_, NetworkStorage> {
        Box::pin(async move {
            let path = format!("SoftLayer_Network_Storage/{id}/getObject");
            absent_when_not_found(self.get(&path, &[]).await)
        })
    }

    fn get_image_template(&self, id: StemcellId) -> LookupFuture<'_, ImageTemplate> {
        Box::pin(async move {
            let path = format!("SoftLayer_Virtual_Guest_Block_Device_Template_Group/{id}/getObject");
            absent_when_not_found(self.get(&path, &[]).await)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(404, "")]
    #[case(500, r#"{"error":"Unable to find object","code":"SoftLayer_Exception_ObjectNotFound"}"#)]
    fn missing_objects_are_reported_as_not_found(#[case] status: u16, #[case] body: &str) {
        let err = classify_failure("SoftLayer_Virtual_Guest/7/getObject", status, body);
        assert!(err.is_not_found(), "unexpected error: {err}");
    }

    #[test]
    fn api_errors_carry_the_softlayer_message() {
        let err = classify_failure(
            "SoftLayer_Product_Order/placeOrder",
            500,
            r#"{"error":"Price is not valid","code":"SoftLayer_Exception_Order_InvalidPrice"}"#,
        );
        assert_eq!(
            err,
            SoftLayerError::Api {
                path: String::from("SoftLayer_Product_Order/placeOrder"),
                status: 500,
                message: String::from("Price is not valid"),
            }
        );
    }

    #[test]
    fn lookups_map_not_found_to_absent() {
        let missing: Result<u8, _> = Err(SoftLayerError::NotFound {
            path: String::from("x"),
        });
        assert_eq!(absent_when_not_found(missing), Ok(None));
        assert_eq!(absent_when_not_found(Ok(3_u8)), Ok(Some(3)));
    }

    #[test]
    fn endpoint_trailing_slash_is_trimmed() {
        let client = HttpSoftLayerClient::new("https://example.test/rest/v3/", "user", "key");
        assert_eq!(
            client.url("SoftLayer_Account/getVirtualGuests"),
            "https://example.test/rest/v3/SoftLayer_Account/getVirtualGuests.json"
        );
    }
}
