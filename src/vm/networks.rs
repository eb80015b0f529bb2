//! Network specifications passed with a create request.

use std::collections::BTreeMap;
use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Kind of network the director asks for.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(from = "String", into = "String")]
pub enum NetworkType {
    /// Address assigned by SoftLayer.
    Dynamic,
    /// Address chosen by the director.
    Manual,
    /// Floating address.
    Vip,
    /// Anything else, including a blank or missing type.
    Other(String),
}

impl Default for NetworkType {
    /// An unset type is unsupported, never `dynamic`.
    fn default() -> Self {
        Self::Other(String::new())
    }
}

impl NetworkType {
    /// Returns the director's spelling of the type.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Dynamic => "dynamic",
            Self::Manual => "manual",
            Self::Vip => "vip",
            Self::Other(value) => value,
        }
    }
}

impl From<String> for NetworkType {
    fn from(value: String) -> Self {
        match value.trim() {
            "dynamic" => Self::Dynamic,
            "manual" => Self::Manual,
            "vip" => Self::Vip,
            _ => Self::Other(value),
        }
    }
}

impl From<NetworkType> for String {
    fn from(value: NetworkType) -> Self {
        value.as_str().to_owned()
    }
}

/// One entry of the director's network specification.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct Network {
    /// Network kind.
    #[serde(rename = "type")]
    pub network_type: NetworkType,
    /// Requested address; on a dynamic network it names a guest to re-image.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    /// Subnet mask.
    pub netmask: String,
    /// Default gateway.
    pub gateway: String,
    /// DNS servers.
    pub dns: Vec<String>,
    /// Properties this network provides defaults for (`dns`, `gateway`).
    pub default: Vec<String>,
    /// Whether the guest network is already configured.
    pub preconfigured: bool,
    /// Provider-specific network properties.
    pub cloud_properties: Map<String, Value>,
}

impl Network {
    /// Returns the requested address, ignoring blank values.
    #[must_use]
    pub fn ip(&self) -> Option<&str> {
        self.ip.as_deref().map(str::trim).filter(|ip| !ip.is_empty())
    }
}

/// Networks keyed by logical name.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Networks(pub BTreeMap<String, Network>);

impl Networks {
    /// Returns the network that decides the creation strategy: the first by name.
    #[must_use]
    pub fn first(&self) -> Option<(&str, &Network)> {
        self.0
            .iter()
            .next()
            .map(|(name, network)| (name.as_str(), network))
    }

    /// Returns `true` when no network was given.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, Network)> for Networks {
    fn from_iter<I: IntoIterator<Item = (String, Network)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Returns `true` when `ip` is an RFC 1918 private IPv4 address.
///
/// Private addresses are looked up as backend addresses, everything else as
/// public addresses.
#[must_use]
pub fn is_private_address(ip: &str) -> bool {
    ip.trim()
        .parse::<Ipv4Addr>()
        .is_ok_and(|address| address.is_private())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("dynamic", NetworkType::Dynamic)]
    #[case("manual", NetworkType::Manual)]
    #[case("vip", NetworkType::Vip)]
    #[case("floating", NetworkType::Other(String::from("floating")))]
    #[case("", NetworkType::Other(String::new()))]
    fn network_types_parse_from_director_strings(
        #[case] raw: &str,
        #[case] expected: NetworkType,
    ) {
        assert_eq!(NetworkType::from(raw.to_owned()), expected);
    }

    #[test]
    fn first_network_is_chosen_by_name() {
        let networks: Networks = serde_json::from_str(
            r#"{"zeta":{"type":"manual"},"alpha":{"type":"dynamic","ip":"10.0.0.11"}}"#,
        )
        .unwrap_or_else(|err| panic!("decode networks: {err}"));

        let Some((name, network)) = networks.first() else {
            panic!("expected a network");
        };
        assert_eq!(name, "alpha");
        assert_eq!(network.network_type, NetworkType::Dynamic);
        assert_eq!(network.ip(), Some("10.0.0.11"));
    }

    #[test]
    fn missing_type_is_not_dynamic() {
        let networks: Networks = serde_json::from_str(r#"{"net0":{"ip":null}}"#)
            .unwrap_or_else(|err| panic!("decode networks: {err}"));

        let Some((_, network)) = networks.first() else {
            panic!("expected a network");
        };
        assert_eq!(network.network_type, NetworkType::Other(String::new()));
        assert_eq!(network.ip(), None);
    }

    #[rstest]
    #[case("10.0.0.11", true)]
    #[case("192.168.1.5", true)]
    #[case("172.16.4.2", true)]
    #[case("169.45.10.2", false)]
    #[case("not-an-ip", false)]
    fn private_addresses_are_classified(#[case] ip: &str, #[case] expected: bool) {
        assert_eq!(is_private_address(ip), expected);
    }
}
