use serde::Serialize;

use super::xml::{children_named, NamespaceScope, XmlElement};

pub const MD_NS: &str = "urn:oasis:names:tc:SAML:2.0:metadata";
pub const DSIG_NS: &str = "http://www.w3.org/2000/09/xmldsig#";

/// The two roles a metadata entity can play towards us.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Idp,
    Sp,
}

impl Role {
    /// Processing order: the IDP connection is always created first.
    pub const ALL: [Role; 2] = [Role::Idp, Role::Sp];

    /// Local name of the role descriptor in the metadata namespace.
    pub fn descriptor(self) -> &'static str {
        match self {
            Role::Idp => "IDPSSODescriptor",
            Role::Sp => "SPSSODescriptor",
        }
    }

    /// Lowercase tag used in backchannel usernames and friendly-name scopes.
    pub fn tag(self) -> &'static str {
        match self {
            Role::Idp => "idp",
            Role::Sp => "sp",
        }
    }

    /// Role identifier understood by the connection management service.
    pub fn remote_name(self) -> &'static str {
        match self {
            Role::Idp => "IDP",
            Role::Sp => "SP",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.remote_name())
    }
}

/// A self-contained `EntityDescriptor`: every namespace prefix it uses is
/// declared on the element itself or below it.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityDescriptor {
    element: XmlElement,
}

impl EntityDescriptor {
    pub fn new(element: XmlElement) -> Self {
        Self { element }
    }

    pub fn element(&self) -> &XmlElement {
        &self.element
    }

    pub fn element_mut(&mut self) -> &mut XmlElement {
        &mut self.element
    }

    pub fn scope(&self) -> NamespaceScope {
        NamespaceScope::default().enter(&self.element)
    }

    pub fn entity_id(&self) -> &str {
        self.element.attr("entityID").unwrap_or_default()
    }

    /// Text of the first `Organization/OrganizationName`, if any.
    pub fn organization_name(&self) -> Option<String> {
        let scope = self.scope();
        let org = children_named(&self.element, &scope, MD_NS, "Organization")
            .into_iter()
            .next()?;
        let org_scope = scope.enter(org);
        children_named(org, &org_scope, MD_NS, "OrganizationName")
            .into_iter()
            .next()
            .map(|name| name.text().trim().to_string())
            .filter(|name| !name.is_empty())
    }

    pub fn contact_emails(&self) -> Vec<String> {
        let scope = self.scope();
        let mut emails = Vec::new();
        for contact in children_named(&self.element, &scope, MD_NS, "ContactPerson") {
            let contact_scope = scope.enter(contact);
            for email in children_named(contact, &contact_scope, MD_NS, "EmailAddress") {
                emails.push(email.text());
            }
        }
        emails
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.role_descriptor(role).is_some()
    }

    /// Roles present on this entity, IDP first.
    pub fn roles(&self) -> Vec<Role> {
        Role::ALL.into_iter().filter(|r| self.has_role(*r)).collect()
    }

    pub fn role_descriptor(&self, role: Role) -> Option<&XmlElement> {
        let scope = self.scope();
        children_named(&self.element, &scope, MD_NS, role.descriptor())
            .into_iter()
            .next()
    }

    /// Mutable access to the first descriptor of `role`.
    pub fn role_descriptor_mut(&mut self, role: Role) -> Option<&mut XmlElement> {
        let scope = self.scope();
        self.element
            .elements_mut()
            .find(|child| scope.enter(child).is(child, MD_NS, role.descriptor()))
    }

    /// Drops every descriptor of `role` from the entity.
    pub fn remove_role(&mut self, role: Role) {
        let scope = self.scope();
        self.element
            .retain_elements(|child| !scope.enter(child).is(child, MD_NS, role.descriptor()));
    }
}
