use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::model::extension::{AttributeMapping, Bindings};

pub const CONFIG_FILE: &str = "metaprov.toml";
const HOME_CONFIG_FILE: &str = ".metaprov.toml";

pub const DEFAULT_PREFERRED_PROTOCOL: &str = "urn:oasis:names:tc:SAML:2.0:protocol";
pub const DEFAULT_TARGET_RESOURCE: &str = "http://dummy";

/// Provisioning settings loaded from `metaprov.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct Settings {
    /// URL or local path of the metadata document.
    pub metadata: String,
    /// PEM certificate the metadata signature is verified against.
    #[serde(default)]
    pub certificate: Option<PathBuf>,
    pub connection_manager: ConnectionManagerSettings,
    /// Fingerprint of the key pair that signs outgoing messages.
    pub signing_key_fingerprint: String,
    pub adapter: Adapters,
    #[serde(default)]
    pub bindings: Bindings,
    /// Needed by SAML 1.1 SP connections.
    #[serde(default = "default_target_resource")]
    pub default_target_resource: String,
    /// Shared password of the synthetic SOAP backchannel credentials.
    pub basic_auth_password: String,
    /// Protocol kept when a role lists several.
    #[serde(default = "default_preferred_protocol")]
    pub preferred_protocol: String,
    #[serde(default)]
    pub include: BTreeSet<String>,
    #[serde(default)]
    pub exclude: BTreeSet<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ConnectionManagerSettings {
    pub url: String,
    pub user: String,
    pub password: String,
    #[serde(default)]
    pub accept_invalid_certs: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Adapters {
    /// Local IDP adapter, used for connections to remote SPs.
    pub idp: AdapterSettings,
    /// Local SP adapter, used for connections to remote IDPs.
    pub sp: AdapterSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct AdapterSettings {
    pub instance: String,
    #[serde(default)]
    pub attribute_map: Vec<AttributeMapEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AttributeMapEntry {
    pub assertion: String,
    pub adapter: String,
}

impl AdapterSettings {
    /// Mapping from assertion attributes to adapter attributes.
    pub fn assertion_to_adapter(&self) -> Vec<AttributeMapping> {
        self.attribute_map
            .iter()
            .map(|e| AttributeMapping {
                source: e.assertion.clone(),
                target: e.adapter.clone(),
            })
            .collect()
    }

    /// Mapping from adapter attributes to assertion attributes.
    pub fn adapter_to_assertion(&self) -> Vec<AttributeMapping> {
        self.attribute_map
            .iter()
            .map(|e| AttributeMapping {
                source: e.adapter.clone(),
                target: e.assertion.clone(),
            })
            .collect()
    }
}

fn default_target_resource() -> String {
    DEFAULT_TARGET_RESOURCE.to_string()
}

fn default_preferred_protocol() -> String {
    DEFAULT_PREFERRED_PROTOCOL.to_string()
}

/// Finds the settings file: the explicit path if given, otherwise
/// `metaprov.toml` in the working directory, then `~/.metaprov.toml`.
pub fn locate(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    let candidates = [
        Some(PathBuf::from(CONFIG_FILE)),
        dirs_home().map(|h| h.join(HOME_CONFIG_FILE)),
    ];
    candidates
        .into_iter()
        .flatten()
        .find(|p| p.is_file())
        .with_context(|| {
            format!(
                "No {} in the current directory or {} in $HOME; pass --config",
                CONFIG_FILE, HOME_CONFIG_FILE
            )
        })
}

pub fn load(path: &Path) -> Result<Settings> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    parse_str(&content).with_context(|| format!("Invalid settings in {}", path.display()))
}

pub fn parse_str(content: &str) -> Result<Settings> {
    let settings: Settings = toml::from_str(content)?;
    anyhow::ensure!(
        !settings.metadata.trim().is_empty(),
        "metadata source must not be empty"
    );
    Ok(settings)
}

fn dirs_home() -> Option<PathBuf> {
    std::env::var_os("HOME").map(PathBuf::from)
}

#[cfg(test)]
pub(crate) const SAMPLE: &str = r#"
metadata = "tests/fixtures/aggregate.xml"
signing-key-fingerprint = "B12B687C1E6F3AB59E05823D7C19CF8F"
basic-auth-password = "OBF:AES:secret"
exclude = ["https://excluded.example.org"]

[connection-manager]
url = "https://localhost:9999/pf-mgmt-ws/ws/ConnectionMigrationMgr"
user = "heuristics"
password = "Changeme1"

[adapter.idp]
instance = "LDAPADAPTER0"
attribute-map = [
    { assertion = "SAML_SUBJECT", adapter = "subject" },
    { assertion = "urn:oid:0.9.2342.19200300.100.1.3", adapter = "mail" },
]

[adapter.sp]
instance = "OTKAPACHE0"
attribute-map = [
    { assertion = "SAML_SUBJECT", adapter = "subject" },
]
"#;

#[cfg(test)]
pub(crate) fn sample() -> Settings {
    parse_str(SAMPLE).unwrap()
}
