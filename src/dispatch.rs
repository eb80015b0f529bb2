//! Director request dispatch.
//!
//! The director sends one JSON request per process invocation and expects one
//! JSON response on stdout. Failures are reported inside the response rather
//! than through the exit status.

use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::action::{ActionError, AttachDisk, CreateVm, CreateVmRequest, HasVm, RebootVm};
use crate::disk::SoftLayerDiskFinder;
use crate::softlayer::{DiskId, GuestId, SoftLayerClient, StemcellId};
use crate::stemcell::SoftLayerStemcellFinder;
use crate::vm::{AgentOptions, CreatorWaits, HostsRegistrar, SoftLayerVmFinder, VmCreator};

/// Error type reported for methods this plugin does not implement.
pub const NOT_IMPLEMENTED: &str = "Bosh::Clouds::NotImplemented";
/// Error type reported when a VM could not be created.
pub const VM_CREATION_FAILED: &str = "Bosh::Clouds::VMCreationFailed";
/// Error type reported for every other failure.
pub const CLOUD_ERROR: &str = "Bosh::Clouds::CloudError";

/// One director request.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(default)]
pub struct Request {
    /// Method name, such as `create_vm`.
    pub method: String,
    /// Positional arguments.
    pub arguments: Vec<Value>,
    /// Director context, such as its UUID.
    pub context: Map<String, Value>,
}

/// Failure reported to the director.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct ResponseError {
    /// Director error class.
    #[serde(rename = "type")]
    pub kind: String,
    /// Human-readable message.
    pub message: String,
    /// Whether the director may retry the call.
    pub ok_to_retry: bool,
}

/// Reply written back to the director.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Response {
    /// Method result; `null` on failure.
    pub result: Value,
    /// Failure details, if any.
    pub error: Option<ResponseError>,
    /// Log text returned to the director.
    pub log: String,
}

impl Response {
    /// Builds a successful response.
    #[must_use]
    pub fn success(result: Value) -> Self {
        Self {
            result,
            error: None,
            log: String::new(),
        }
    }

    /// Builds a failed response.
    #[must_use]
    pub fn failure(error: &DispatchError) -> Self {
        Self {
            result: Value::Null,
            error: Some(ResponseError {
                kind: error.kind().to_owned(),
                message: error.to_string(),
                ok_to_retry: false,
            }),
            log: String::new(),
        }
    }
}

/// Errors raised while dispatching a request.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum DispatchError {
    /// Raised for methods this plugin does not implement.
    #[error("method '{method}' is not implemented")]
    UnknownMethod {
        /// Requested method.
        method: String,
    },
    /// Raised when the arguments do not match the method signature.
    #[error("invalid arguments for '{method}': {reason}")]
    InvalidArguments {
        /// Requested method.
        method: &'static str,
        /// What was wrong.
        reason: String,
    },
    /// Raised when the action fails.
    #[error(transparent)]
    Action(Box<ActionError>),
}

impl From<ActionError> for DispatchError {
    fn from(value: ActionError) -> Self {
        Self::Action(Box::new(value))
    }
}

impl DispatchError {
    /// Returns the director error class for this failure.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnknownMethod { .. } => NOT_IMPLEMENTED,
            Self::Action(error) if matches!(**error, ActionError::CreateVm { .. }) => {
                VM_CREATION_FAILED
            }
            Self::InvalidArguments { .. } | Self::Action(_) => CLOUD_ERROR,
        }
    }
}

/// Positional arguments of one request.
struct Arguments<'a> {
    method: &'static str,
    values: &'a [Value],
}

impl<'a> Arguments<'a> {
    const fn new(method: &'static str, values: &'a [Value]) -> Self {
        Self { method, values }
    }

    fn invalid(&self, reason: String) -> DispatchError {
        DispatchError::InvalidArguments {
            method: self.method,
            reason,
        }
    }

    fn required(&self, index: usize, name: &str) -> Result<&'a Value, DispatchError> {
        self.values
            .get(index)
            .filter(|value| !value.is_null())
            .ok_or_else(|| self.invalid(format!("missing {name}")))
    }

    fn string(&self, index: usize, name: &str) -> Result<String, DispatchError> {
        self.required(index, name)?
            .as_str()
            .map(ToOwned::to_owned)
            .ok_or_else(|| self.invalid(format!("{name} must be a string")))
    }

    fn cid<T: FromStr + From<u64>>(&self, index: usize, name: &str) -> Result<T, DispatchError> {
        let value = self.required(index, name)?;
        parse_cid(value).ok_or_else(|| self.invalid(format!("{name} is not a valid cid: {value}")))
    }

    fn cids<T: FromStr + From<u64>>(&self, index: usize, name: &str) -> Result<Vec<T>, DispatchError> {
        let Some(Value::Array(items)) = self.values.get(index) else {
            return Ok(Vec::new());
        };
        items
            .iter()
            .map(|value| {
                parse_cid(value)
                    .ok_or_else(|| self.invalid(format!("{name} entry is not a valid cid: {value}")))
            })
            .collect()
    }

    fn document<T: DeserializeOwned + Default>(
        &self,
        index: usize,
        name: &str,
    ) -> Result<T, DispatchError> {
        self.values
            .get(index)
            .filter(|value| !value.is_null())
            .map_or_else(
                || Ok(T::default()),
                |value| {
                    serde_json::from_value(value.clone())
                        .map_err(|err| self.invalid(format!("{name}: {err}")))
                },
            )
    }
}

fn parse_cid<T: FromStr + From<u64>>(value: &Value) -> Option<T> {
    match value {
        Value::String(text) => text.parse().ok(),
        Value::Number(number) => number.as_u64().map(T::from),
        _ => None,
    }
}

/// Routes director requests to the lifecycle actions.
#[derive(Clone, Debug)]
pub struct Dispatcher<C, H> {
    client: C,
    hosts: H,
    agent_options: AgentOptions,
    waits: CreatorWaits,
}

impl<C, H> Dispatcher<C, H>
where
    C: SoftLayerClient,
    H: HostsRegistrar + Clone,
{
    /// Creates a dispatcher whose actions share `client`.
    #[must_use]
    pub const fn new(client: C, hosts: H, agent_options: AgentOptions, waits: CreatorWaits) -> Self {
        Self {
            client,
            hosts,
            agent_options,
            waits,
        }
    }

    /// Handles one request, reporting failures inside the response.
    pub async fn dispatch(&self, request: &Request) -> Response {
        debug!(method = %request.method, context = ?request.context, "dispatching request");
        match self.handle(request).await {
            Ok(result) => {
                info!(method = %request.method, "request succeeded");
                Response::success(result)
            }
            Err(error) => {
                warn!(method = %request.method, %error, "request failed");
                Response::failure(&error)
            }
        }
    }

    /// Handles one request.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError`] when the method is unknown, its arguments are
    /// malformed, or the action fails.
    pub async fn handle(&self, request: &Request) -> Result<Value, DispatchError> {
        match request.method.as_str() {
            "create_vm" => {
                self.create_vm(&Arguments::new("create_vm", &request.arguments))
                    .await
            }
            "has_vm" => self.has_vm(&Arguments::new("has_vm", &request.arguments)).await,
            "reboot_vm" => {
                self.reboot_vm(&Arguments::new("reboot_vm", &request.arguments))
                    .await
            }
            "attach_disk" => {
                self.attach_disk(&Arguments::new("attach_disk", &request.arguments))
                    .await
            }
            other => Err(DispatchError::UnknownMethod {
                method: other.to_owned(),
            }),
        }
    }

    fn vm_finder(&self) -> SoftLayerVmFinder<C> {
        SoftLayerVmFinder::new(self.client.clone())
    }

    async fn create_vm(&self, args: &Arguments<'_>) -> Result<Value, DispatchError> {
        let request = CreateVmRequest {
            agent_id: args.string(0, "agent_id")?,
            stemcell_cid: args.cid::<StemcellId>(1, "stemcell_cid")?,
            cloud_properties: args.document(2, "cloud_properties")?,
            networks: args.document(3, "networks")?,
            disk_cids: args.cids::<DiskId>(4, "disk_cids")?,
            env: args.document(5, "env")?,
        };
        let creator = VmCreator::new(
            self.client.clone(),
            self.vm_finder(),
            self.hosts.clone(),
            self.agent_options.clone(),
            self.waits,
        );
        let action = CreateVm::new(SoftLayerStemcellFinder::new(self.client.clone()), creator);
        let id = action.run(&request).await?;
        Ok(Value::String(id.to_string()))
    }

    async fn has_vm(&self, args: &Arguments<'_>) -> Result<Value, DispatchError> {
        let vm_cid = args.cid::<GuestId>(0, "vm_cid")?;
        let found = HasVm::new(self.vm_finder()).run(vm_cid).await?;
        Ok(Value::Bool(found))
    }

    async fn reboot_vm(&self, args: &Arguments<'_>) -> Result<Value, DispatchError> {
        let vm_cid = args.cid::<GuestId>(0, "vm_cid")?;
        RebootVm::new(self.vm_finder()).run(vm_cid).await?;
        Ok(Value::Null)
    }

    async fn attach_disk(&self, args: &Arguments<'_>) -> Result<Value, DispatchError> {
        let vm_cid = args.cid::<GuestId>(0, "vm_cid")?;
        let disk_cid = args.cid::<DiskId>(1, "disk_cid")?;
        AttachDisk::new(
            self.vm_finder(),
            SoftLayerDiskFinder::new(self.client.clone()),
        )
        .run(vm_cid, disk_cid)
        .await?;
        Ok(Value::Null)
    }
}
