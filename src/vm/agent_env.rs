//! Agent bootstrap payload pushed to guests as user metadata.
//!
//! The payload is rebuilt on every create pass from the agent options, the
//! request and the guest's current addresses. It is always pushed whole.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use url::Url;

use super::hosts::HostsRegistrar;
use super::networks::Networks;
use super::{CloudProperties, InstanceHandle, VmError};

/// Free-form `env` document forwarded by the director.
pub type Environment = Map<String, Value>;

const DAV_PROVIDER: &str = "dav";
const SYSTEM_DISK: &str = "/dev/xvda";
const EPHEMERAL_DISK: &str = "/dev/xvdc";

/// Agent settings shared by every guest, loaded from the agent options file.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(default)]
pub struct AgentOptions {
    /// Message bus URL template; its host is replaced per guest.
    pub mbus: String,
    /// NTP servers.
    pub ntp: Vec<String>,
    /// Blobstore settings.
    pub blobstore: BlobstoreOptions,
    /// Crypted password applied to the `vcap` user after provisioning.
    #[serde(alias = "vcappassword")]
    pub vcap_password: Option<String>,
}

impl AgentOptions {
    /// Checks the settings every payload needs.
    ///
    /// # Errors
    ///
    /// Returns [`VmError::InvalidMbusConfig`] when the mbus template is empty
    /// and [`VmError::InvalidBlobstoreConfig`] when no provider is named.
    pub fn validate(&self) -> Result<(), VmError> {
        if self.mbus.trim().is_empty() {
            return Err(VmError::InvalidMbusConfig {
                reason: String::from("mbus must not be empty"),
            });
        }
        if self.blobstore.provider().trim().is_empty() {
            return Err(VmError::InvalidBlobstoreConfig {
                reason: String::from("blobstore provider must not be empty"),
            });
        }
        Ok(())
    }

    /// Returns the override credential, ignoring blank values.
    #[must_use]
    pub fn vcap_password(&self) -> Option<&str> {
        self.vcap_password
            .as_deref()
            .filter(|password| !password.trim().is_empty())
    }
}

/// WebDav blobstore settings.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct DavConfig {
    /// Endpoint URL; its host is rewritten to the resolved director address.
    pub endpoint: String,
    /// Basic auth user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    /// Basic auth password.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// Remaining provider options, passed through untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl From<DavConfig> for Map<String, Value> {
    fn from(dav: DavConfig) -> Self {
        let mut options = dav.extra;
        options.insert(String::from("endpoint"), Value::String(dav.endpoint));
        if let Some(user) = dav.user {
            options.insert(String::from("user"), Value::String(user));
        }
        if let Some(password) = dav.password {
            options.insert(String::from("password"), Value::String(password));
        }
        options
    }
}

/// Blobstore settings, resolved once when the options are loaded.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(try_from = "RawBlobstore", into = "RawBlobstore")]
pub enum BlobstoreOptions {
    /// WebDav blobstore served by the director.
    WebDav(DavConfig),
    /// Any other provider, passed through untouched.
    Other {
        /// Provider name.
        provider: String,
        /// Provider options.
        options: Map<String, Value>,
    },
}

impl Default for BlobstoreOptions {
    fn default() -> Self {
        Self::Other {
            provider: String::new(),
            options: Map::new(),
        }
    }
}

impl BlobstoreOptions {
    /// Returns the provider name.
    #[must_use]
    pub fn provider(&self) -> &str {
        match self {
            Self::WebDav(_) => DAV_PROVIDER,
            Self::Other { provider, .. } => provider,
        }
    }

    /// Returns a copy pointing a WebDav endpoint at `host`.
    ///
    /// # Errors
    ///
    /// Returns [`VmError::InvalidBlobstoreConfig`] when the endpoint is not a
    /// URL with a host.
    pub fn with_host(&self, host: &str) -> Result<Self, VmError> {
        match self {
            Self::WebDav(dav) => {
                let endpoint = replace_host(&dav.endpoint, host).map_err(|reason| {
                    VmError::InvalidBlobstoreConfig {
                        reason: format!("dav endpoint '{}': {reason}", dav.endpoint),
                    }
                })?;
                Ok(Self::WebDav(DavConfig {
                    endpoint,
                    ..dav.clone()
                }))
            }
            Self::Other { .. } => Ok(self.clone()),
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
struct RawBlobstore {
    #[serde(default, alias = "type")]
    provider: String,
    #[serde(default)]
    options: Map<String, Value>,
}

impl TryFrom<RawBlobstore> for BlobstoreOptions {
    type Error = String;

    fn try_from(raw: RawBlobstore) -> Result<Self, Self::Error> {
        if raw.provider == DAV_PROVIDER {
            let dav = serde_json::from_value(Value::Object(raw.options))
                .map_err(|err| format!("invalid dav blobstore options: {err}"))?;
            return Ok(Self::WebDav(dav));
        }
        Ok(Self::Other {
            provider: raw.provider,
            options: raw.options,
        })
    }
}

impl From<BlobstoreOptions> for RawBlobstore {
    fn from(options: BlobstoreOptions) -> Self {
        match options {
            BlobstoreOptions::WebDav(dav) => Self {
                provider: DAV_PROVIDER.to_owned(),
                options: dav.into(),
            },
            BlobstoreOptions::Other { provider, options } => Self { provider, options },
        }
    }
}

/// Identity of the guest inside the payload.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct VmSpec {
    /// Director-facing name.
    pub name: String,
    /// Guest identifier.
    pub id: String,
}

/// Device paths the agent mounts.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct DisksSpec {
    /// Root device.
    pub system: String,
    /// Ephemeral device, present only when an ephemeral disk was ordered.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ephemeral: Option<String>,
    /// Persistent disks by cid.
    pub persistent: Map<String, Value>,
}

/// Bootstrap payload read by the guest agent on first boot.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct AgentEnv {
    /// Agent identifier assigned by the director.
    pub agent_id: String,
    /// Guest identity.
    pub vm: VmSpec,
    /// Message bus URL pointing at the resolved host.
    pub mbus: String,
    /// NTP servers.
    pub ntp: Vec<String>,
    /// Blobstore settings pointing at the resolved host.
    pub blobstore: BlobstoreOptions,
    /// Networks as requested.
    pub networks: Networks,
    /// Device layout.
    pub disks: DisksSpec,
    /// Director `env` document.
    pub env: Environment,
}

impl AgentEnv {
    /// Serialises the payload to the JSON blob stored as user metadata.
    ///
    /// # Errors
    ///
    /// Returns [`VmError::AgentEnvEncoding`] when serialisation fails.
    pub fn encode(&self) -> Result<String, VmError> {
        serde_json::to_string(self).map_err(|err| VmError::AgentEnvEncoding(err.to_string()))
    }

    /// Returns a copy whose `env.bosh.password` is set to `password`.
    #[must_use]
    pub fn with_vcap_password(&self, password: &str) -> Self {
        let mut updated = self.clone();
        let bosh = updated
            .env
            .entry("bosh")
            .or_insert_with(|| Value::Object(Map::new()));
        if !bosh.is_object() {
            *bosh = Value::Object(Map::new());
        }
        if let Value::Object(settings) = bosh {
            settings.insert(String::from("password"), json!(password));
        }
        updated
    }
}

enum ResolvedHost<'a> {
    Director(&'a str),
    Guest(&'a str),
}

impl ResolvedHost<'_> {
    const fn address(&self) -> &str {
        match self {
            Self::Director(ip) | Self::Guest(ip) => ip,
        }
    }
}

fn resolve_host<'a>(
    cloud_props: &'a CloudProperties,
    handle: &'a InstanceHandle,
) -> Result<ResolvedHost<'a>, VmError> {
    cloud_props.bosh_ip().map_or_else(
        || {
            handle
                .primary_backend_ip()
                .map(ResolvedHost::Guest)
                .ok_or_else(|| VmError::InvalidMbusConfig {
                    reason: format!(
                        "no bosh_ip given and virtual guest {} has no primary backend IP address",
                        handle.id
                    ),
                })
        },
        |ip| Ok(ResolvedHost::Director(ip)),
    )
}

/// Builds the agent payload for a provisioned guest.
///
/// The message bus and WebDav hosts point at `bosh_ip` when the cloud
/// properties name one, otherwise at the guest's backend address. In the
/// latter case the guest is also registered with `hosts`.
///
/// # Errors
///
/// Returns [`VmError::InvalidMbusConfig`] when no host can be resolved or the
/// template is not a URL, and [`VmError::InvalidBlobstoreConfig`] when the
/// WebDav endpoint cannot be rewritten.
pub fn build_bootstrap_payload(
    agent_id: &str,
    handle: &InstanceHandle,
    cloud_props: &CloudProperties,
    networks: &Networks,
    env: &Environment,
    options: &AgentOptions,
    hosts: &dyn HostsRegistrar,
) -> Result<AgentEnv, VmError> {
    let host = resolve_host(cloud_props, handle)?;
    let mbus = parse_mbus_url(&options.mbus, host.address())?;
    let blobstore = options.blobstore.with_host(host.address())?;

    if let ResolvedHost::Guest(ip) = host {
        hosts.register_host(ip, &handle.fqdn);
    }

    Ok(AgentEnv {
        agent_id: agent_id.to_owned(),
        vm: VmSpec {
            name: format!("vm-{agent_id}"),
            id: handle.id.to_string(),
        },
        mbus,
        ntp: options.ntp.clone(),
        blobstore,
        networks: networks.clone(),
        disks: DisksSpec {
            system: SYSTEM_DISK.to_owned(),
            ephemeral: (cloud_props.ephemeral_disk_size > 0).then(|| EPHEMERAL_DISK.to_owned()),
            persistent: Map::new(),
        },
        env: env.clone(),
    })
}

/// Rewrites the host of the message bus template, keeping scheme,
/// credentials and port.
///
/// # Errors
///
/// Returns [`VmError::InvalidMbusConfig`] when the template is not a URL with
/// a host.
pub fn parse_mbus_url(template: &str, host: &str) -> Result<String, VmError> {
    replace_host(template, host).map_err(|reason| VmError::InvalidMbusConfig {
        reason: format!("mbus '{template}': {reason}"),
    })
}

fn replace_host(template: &str, host: &str) -> Result<String, String> {
    let parsed = Url::parse(template.trim()).map_err(|err| err.to_string())?;
    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(String::from("URL has no host"));
    }

    let mut rendered = format!("{}://", parsed.scheme());
    if !parsed.username().is_empty() || parsed.password().is_some() {
        rendered.push_str(parsed.username());
        if let Some(password) = parsed.password() {
            rendered.push(':');
            rendered.push_str(password);
        }
        rendered.push('@');
    }
    rendered.push_str(host);
    if let Some(port) = parsed.port_or_known_default() {
        rendered.push(':');
        rendered.push_str(&port.to_string());
    }
    Ok(rendered)
}
