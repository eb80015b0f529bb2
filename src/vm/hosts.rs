//! Local name resolution for guests reached through their backend address.

use camino::Utf8PathBuf;
use tracing::{info, warn};

use crate::fs_util;

/// Default hosts file.
pub const DEFAULT_HOSTS_FILE: &str = "/etc/hosts";

/// Registers a name for a freshly provisioned guest.
///
/// Registration is fire-and-forget: implementations log failures instead of
/// returning them.
pub trait HostsRegistrar: Send + Sync {
    /// Maps `fqdn` to `ip`, replacing any previous entry for `fqdn`.
    fn register_host(&self, ip: &str, fqdn: &str);
}

/// [`HostsRegistrar`] that rewrites a hosts file.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EtcHostsFile {
    path: Utf8PathBuf,
}

impl EtcHostsFile {
    /// Targets the hosts file at `path`.
    #[must_use]
    pub fn new(path: impl Into<Utf8PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn update(&self, ip: &str, fqdn: &str) -> Result<(), String> {
        let existing = fs_util::read_optional(&self.path)?.unwrap_or_default();
        fs_util::write(&self.path, &render_hosts(&existing, ip, fqdn))
    }
}

impl Default for EtcHostsFile {
    fn default() -> Self {
        Self::new(DEFAULT_HOSTS_FILE)
    }
}

impl HostsRegistrar for EtcHostsFile {
    fn register_host(&self, ip: &str, fqdn: &str) {
        match self.update(ip, fqdn) {
            Ok(()) => info!(ip, fqdn, path = %self.path, "registered host entry"),
            Err(message) => warn!(ip, fqdn, path = %self.path, %message, "failed to update hosts file"),
        }
    }
}

/// Returns `existing` with every line naming `fqdn` replaced by `"ip  fqdn"`.
#[must_use]
pub fn render_hosts(existing: &str, ip: &str, fqdn: &str) -> String {
    let mut lines: Vec<&str> = existing
        .lines()
        .filter(|line| !names_host(line, fqdn))
        .collect();
    let entry = format!("{ip}  {fqdn}");
    lines.push(&entry);

    let mut rendered = lines.join("\n");
    rendered.push('\n');
    rendered
}

fn names_host(line: &str, fqdn: &str) -> bool {
    let content = line.split('#').next().unwrap_or_default();
    content.split_whitespace().skip(1).any(|name| name == fqdn)
}
