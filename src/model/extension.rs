//! Federation-server specific connection settings carried inside SAML
//! metadata `Extensions`.

use serde::Deserialize;

use super::metadata::Role;
use super::xml::XmlElement;

pub const VENDOR_NS: &str = "urn:sourceid.org:saml2:metadata-extension:v2";
pub const VENDOR_PREFIX: &str = "urn";
pub const SOAP_AUTH_NS: &str = "http://www.sourceid.org/2004/04/soapauth";
pub const SOAP_AUTH_PREFIX: &str = "soap";

fn vendor(local: &str) -> XmlElement {
    XmlElement::new(format!("{}:{}", VENDOR_PREFIX, local))
}

fn soap(local: &str) -> XmlElement {
    XmlElement::new(format!("{}:{}", SOAP_AUTH_PREFIX, local))
}

fn flag(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}

/// Bindings accepted on incoming messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Bindings {
    pub redirect: bool,
    pub post: bool,
    pub soap: bool,
    pub artifact: bool,
}

impl Default for Bindings {
    fn default() -> Self {
        Self {
            redirect: true,
            post: true,
            soap: true,
            artifact: true,
        }
    }
}

impl Bindings {
    fn to_element(self) -> XmlElement {
        vendor("IncomingBindings")
            .with_attr("Redirect", flag(self.redirect))
            .with_attr("POST", flag(self.post))
            .with_attr("SOAP", flag(self.soap))
            .with_attr("Artifact", flag(self.artifact))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnabledProfiles {
    pub sp_initiated_sso: bool,
    pub idp_initiated_sso: bool,
    pub sp_initiated_slo: bool,
    pub idp_initiated_slo: bool,
}

impl EnabledProfiles {
    /// Single sign-on both ways, no single logout.
    pub const SSO_ONLY: EnabledProfiles = EnabledProfiles {
        sp_initiated_sso: true,
        idp_initiated_sso: true,
        sp_initiated_slo: false,
        idp_initiated_slo: false,
    };

    fn to_element(self) -> XmlElement {
        vendor("EnabledProfiles")
            .with_attr("SPInitiatedSSO", flag(self.sp_initiated_sso))
            .with_attr("IDPInitiatedSSO", flag(self.idp_initiated_sso))
            .with_attr("SPInitiatedSLO", flag(self.sp_initiated_slo))
            .with_attr("IDPInitiatedSLO", flag(self.idp_initiated_slo))
    }
}

/// One `(source, target)` attribute mapping entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeMapping {
    pub source: String,
    pub target: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoleMapping {
    /// Fulfils the local SP adapter contract from assertion attributes.
    /// Sources are assertion attributes, targets adapter attributes.
    TargetAttributes {
        adapter_instance: String,
        attributes: Vec<AttributeMapping>,
    },
    /// Fulfils the assertion contract from the local IDP adapter.
    /// Sources are adapter attributes, targets assertion attributes.
    AdapterToAssertion {
        adapter_instance: String,
        attributes: Vec<AttributeMapping>,
        default_target_resource: String,
    },
}

impl RoleMapping {
    fn to_element(&self) -> XmlElement {
        match self {
            RoleMapping::TargetAttributes {
                adapter_instance,
                attributes,
            } => {
                let mut mapping =
                    vendor("TargetAttributeMapping").with_attr("AdapterInstanceId", adapter_instance);
                for a in attributes {
                    mapping = mapping.with_child(attribute_map(&a.source, "Assertion", &a.target));
                }
                vendor("IDP").with_child(mapping)
            }
            RoleMapping::AdapterToAssertion {
                adapter_instance,
                attributes,
                default_target_resource,
            } => {
                let mut defaults = vendor("DefaultAttributeMapping");
                for a in attributes {
                    defaults = defaults.with_child(attribute_map(&a.source, "Adapter", &a.target));
                }
                vendor("SP")
                    .with_attr("DefaultTargetResource", default_target_resource)
                    .with_child(
                        vendor("AdapterToAssertionMapping")
                            .with_attr("AdapterInstanceId", adapter_instance)
                            .with_child(defaults),
                    )
            }
        }
    }
}

/// `Name` is the attribute being fulfilled, `Value` where it comes from.
fn attribute_map(value: &str, source_type: &str, name: &str) -> XmlElement {
    vendor("AttributeMap")
        .with_attr("Value", value)
        .with_attr("Type", source_type)
        .with_attr("Name", name)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleExtension {
    pub incoming_bindings: Bindings,
    pub enabled_profiles: EnabledProfiles,
    pub mapping: RoleMapping,
}

impl RoleExtension {
    pub fn to_element(&self) -> XmlElement {
        vendor("RoleExtension")
            .with_child(self.incoming_bindings.to_element())
            .with_child(self.enabled_profiles.to_element())
            .with_child(self.mapping.to_element())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicAuth {
    pub username: String,
    pub password: String,
}

impl BasicAuth {
    fn to_element(&self) -> XmlElement {
        soap("Basic")
            .with_attr("password", &self.password)
            .with_attr("providerID", "this")
            .with_attr("username", &self.username)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityExtension {
    pub signing_key_fingerprint: String,
    pub incoming: BasicAuth,
    pub outgoing: BasicAuth,
}

impl EntityExtension {
    pub fn to_element(&self) -> XmlElement {
        let soap_auth = vendor("SoapAuth")
            .with_attr(format!("xmlns:{}", SOAP_AUTH_PREFIX), SOAP_AUTH_NS)
            .with_child(soap("Incoming").with_child(self.incoming.to_element()))
            .with_child(soap("Outgoing").with_child(self.outgoing.to_element()));
        vendor("EntityExtension").with_child(
            vendor("Dependencies")
                .with_child(
                    vendor("SigningKeyPairReference")
                        .with_attr("MD5Fingerprint", &self.signing_key_fingerprint),
                )
                .with_child(soap_auth),
        )
    }
}

/// Everything that turns one role of an entity into a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionExtension {
    pub role: Role,
    pub name: String,
    pub active: bool,
    pub entity: EntityExtension,
    pub role_extension: RoleExtension,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifact_flag_is_rendered() {
        let bindings = Bindings {
            artifact: false,
            ..Bindings::default()
        };
        assert_eq!(
            bindings.to_element().to_xml(),
            r#"<urn:IncomingBindings Redirect="true" POST="true" SOAP="true" Artifact="false"/>"#
        );
    }

    #[test]
    fn idp_mapping_targets_adapter_attributes() {
        let mapping = RoleMapping::TargetAttributes {
            adapter_instance: "OTKAPACHE0".to_string(),
            attributes: vec![AttributeMapping {
                source: "SAML_SUBJECT".to_string(),
                target: "subject".to_string(),
            }],
        };
        assert_eq!(
            mapping.to_element().to_xml(),
            concat!(
                r#"<urn:IDP><urn:TargetAttributeMapping AdapterInstanceId="OTKAPACHE0">"#,
                r#"<urn:AttributeMap Value="SAML_SUBJECT" Type="Assertion" Name="subject"/>"#,
                r#"</urn:TargetAttributeMapping></urn:IDP>"#
            )
        );
    }

    #[test]
    fn sp_mapping_carries_default_target_resource() {
        let mapping = RoleMapping::AdapterToAssertion {
            adapter_instance: "LDAPADAPTER0".to_string(),
            attributes: vec![AttributeMapping {
                source: "subject".to_string(),
                target: "urn:oid:0.9.2342.19200300.100.1.3".to_string(),
            }],
            default_target_resource: "http://dummy".to_string(),
        };
        let xml = mapping.to_element().to_xml();
        assert!(xml.starts_with(r#"<urn:SP DefaultTargetResource="http://dummy">"#));
        assert!(xml.contains(r#"<urn:AdapterToAssertionMapping AdapterInstanceId="LDAPADAPTER0"><urn:DefaultAttributeMapping>"#));
        assert!(xml.contains(
            r#"<urn:AttributeMap Value="subject" Type="Adapter" Name="urn:oid:0.9.2342.19200300.100.1.3"/>"#
        ));
    }

    #[test]
    fn entity_extension_layout() {
        let auth = |username: &str| BasicAuth {
            username: username.to_string(),
            password: "secret".to_string(),
        };
        let ext = EntityExtension {
            signing_key_fingerprint: "B12B687C".to_string(),
            incoming: auth("idp:urn:x"),
            outgoing: auth("idp:urn:x"),
        };
        let xml = ext.to_element().to_xml();
        assert!(xml.starts_with(
            r#"<urn:EntityExtension><urn:Dependencies><urn:SigningKeyPairReference MD5Fingerprint="B12B687C"/>"#
        ));
        assert!(xml.contains(r#"<urn:SoapAuth xmlns:soap="http://www.sourceid.org/2004/04/soapauth">"#));
        assert!(xml.contains(
            r#"<soap:Incoming><soap:Basic password="secret" providerID="this" username="idp:urn:x"/></soap:Incoming>"#
        ));
        assert!(xml.contains("<soap:Outgoing>"));
    }
}
