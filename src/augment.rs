//! Turns metadata entities into connection documents.
//!
//! Every step takes an entity by reference and returns a new one; the
//! orchestrator decides which version is serialized for which call.

use tracing::{debug, warn};

use crate::config::Settings;
use crate::model::extension::{
    BasicAuth, ConnectionExtension, EnabledProfiles, EntityExtension, RoleExtension, RoleMapping,
    VENDOR_NS, VENDOR_PREFIX,
};
use crate::model::metadata::{EntityDescriptor, Role, MD_NS};
use crate::model::xml::{children_named, NamespaceScope, XmlElement};

const MAILTO: &str = "mailto:";

/// Entity-level cleanup shared by all connections of an entity: drops
/// existing entity extensions, strips `mailto:` from contact addresses and
/// narrows the protocol list of every role to the preferred protocol.
pub fn prepare_entity(entity: &EntityDescriptor, preferred_protocol: &str) -> EntityDescriptor {
    let mut prepared = entity.clone();
    let entity_id = entity.entity_id().to_string();
    let scope = prepared.scope();

    strip_extensions(prepared.element_mut(), &scope, &entity_id, "entity");
    fix_contact_addresses(prepared.element_mut(), &scope);
    debug!(entity = %entity_id, contacts = ?prepared.contact_emails(), "contact addresses");

    for role in Role::ALL {
        if let Some(descriptor) = prepared.role_descriptor_mut(role) {
            if let Some(declared) = descriptor.attr("protocolSupportEnumeration") {
                let narrowed = narrow_protocols(declared, preferred_protocol);
                descriptor.set_attr("protocolSupportEnumeration", narrowed);
            }
        }
    }
    prepared
}

/// Keeps only `preferred` if the declared list contains it, otherwise
/// returns the list unchanged.
pub fn narrow_protocols(declared: &str, preferred: &str) -> String {
    if declared.split_whitespace().any(|p| p == preferred) {
        preferred.to_string()
    } else {
        declared.to_string()
    }
}

/// Copy of `entity` with every descriptor of `role` removed.
pub fn without_role(entity: &EntityDescriptor, role: Role) -> EntityDescriptor {
    let mut stripped = entity.clone();
    stripped.remove_role(role);
    stripped
}

/// Builds the connection settings for one role of an entity.
pub fn connection_extension(
    entity: &EntityDescriptor,
    role: Role,
    name: String,
    settings: &Settings,
) -> ConnectionExtension {
    let username = format!("{}:{}", role.tag(), entity.entity_id());
    let auth = BasicAuth {
        username,
        password: settings.basic_auth_password.clone(),
    };

    let mut incoming_bindings = settings.bindings;
    if !has_artifact_endpoint(entity, role) {
        debug!(entity = entity.entity_id(), %role, "no artifact resolution endpoint; artifact binding disabled");
        incoming_bindings.artifact = false;
    }

    let mapping = match role {
        Role::Idp => RoleMapping::TargetAttributes {
            adapter_instance: settings.adapter.sp.instance.clone(),
            attributes: settings.adapter.sp.assertion_to_adapter(),
        },
        Role::Sp => RoleMapping::AdapterToAssertion {
            adapter_instance: settings.adapter.idp.instance.clone(),
            attributes: settings.adapter.idp.adapter_to_assertion(),
            default_target_resource: settings.default_target_resource.clone(),
        },
    };

    ConnectionExtension {
        role,
        name,
        active: true,
        entity: EntityExtension {
            signing_key_fingerprint: settings.signing_key_fingerprint.clone(),
            incoming: auth.clone(),
            outgoing: auth,
        },
        role_extension: RoleExtension {
            incoming_bindings,
            enabled_profiles: EnabledProfiles::SSO_ONLY,
            mapping,
        },
    }
}

/// Produces the `EntityDescriptor` uploaded for one connection.
pub fn apply(entity: &EntityDescriptor, connection: &ConnectionExtension) -> XmlElement {
    let mut element = entity.element().clone();
    let entity_id = entity.entity_id().to_string();
    let scope = entity.scope();

    element.declare_namespace(VENDOR_PREFIX, VENDOR_NS);
    element.set_attr(format!("{}:isActive", VENDOR_PREFIX), flag(connection.active));
    element.set_attr(format!("{}:name", VENDOR_PREFIX), connection.name.clone());

    // a prepared entity has no extensions left; strip again for raw input
    strip_extensions(&mut element, &scope, &entity_id, "entity");
    let extensions = extensions_element(&element).with_child(connection.entity.to_element());
    element.insert_first(extensions);

    let role = connection.role;
    if let Some(descriptor) = element
        .elements_mut()
        .find(|child| scope.enter(child).is(child, MD_NS, role.descriptor()))
    {
        let descriptor_scope = scope.enter(descriptor);
        strip_extensions(descriptor, &descriptor_scope, &entity_id, role.tag());
        let extensions =
            extensions_element(descriptor).with_child(connection.role_extension.to_element());
        descriptor.insert_first(extensions);
    }
    element
}

fn flag(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}

/// `Extensions` element in the metadata namespace, using the same prefix
/// as `parent`.
fn extensions_element(parent: &XmlElement) -> XmlElement {
    match parent.prefix() {
        Some(prefix) => XmlElement::new(format!("{}:Extensions", prefix)),
        None => XmlElement::new("Extensions"),
    }
}

fn strip_extensions(element: &mut XmlElement, scope: &NamespaceScope, entity_id: &str, level: &str) {
    let existing: Vec<String> = children_named(element, scope, MD_NS, "Extensions")
        .into_iter()
        .map(|e| e.to_xml())
        .collect();
    if existing.is_empty() {
        return;
    }
    for xml in &existing {
        warn!(entity = entity_id, level, "ignoring unsupported extensions");
        debug!(entity = entity_id, level, discarded = %xml);
    }
    element.retain_elements(|child| !scope.enter(child).is(child, MD_NS, "Extensions"));
}

fn fix_contact_addresses(element: &mut XmlElement, scope: &NamespaceScope) {
    for contact in element.elements_mut() {
        let contact_scope = scope.enter(contact);
        if !contact_scope.is(contact, MD_NS, "ContactPerson") {
            continue;
        }
        for address in contact.elements_mut() {
            if !contact_scope.enter(address).is(address, MD_NS, "EmailAddress") {
                continue;
            }
            let text = address.text();
            let trimmed = text.trim();
            if let Some(stripped) = trimmed.strip_prefix(MAILTO) {
                address.set_text(stripped.to_string());
            }
        }
    }
}

fn has_artifact_endpoint(entity: &EntityDescriptor, role: Role) -> bool {
    let Some(descriptor) = entity.role_descriptor(role) else {
        return false;
    };
    let scope = entity.scope().enter(descriptor);
    !children_named(descriptor, &scope, MD_NS, "ArtifactResolutionService").is_empty()
}
