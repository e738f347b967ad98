use std::collections::HashMap;

use crate::model::metadata::{EntityDescriptor, Role};

/// Marks connection names as provisioned by this tool in the admin console.
pub const PROVISIONED_PREFIX: &str = "[P] ";

/// Friendly name before deduplication: the organization name, or the entity
/// identifier when the entity declares no organization.
pub fn base_name(entity: &EntityDescriptor) -> String {
    let label = entity
        .organization_name()
        .unwrap_or_else(|| entity.entity_id().to_string());
    format!("{}{}", PROVISIONED_PREFIX, label)
}

/// Hands out unique friendly names per role for the lifetime of a run.
#[derive(Debug, Default)]
pub struct NameRegistry {
    seen: HashMap<(Role, String), u32>,
}

impl NameRegistry {
    /// First use of `(role, base)` returns `base`; later uses return
    /// `base (1)`, `base (2)`, and so on.
    pub fn generate(&mut self, base: &str, role: Role) -> String {
        match self.seen.get_mut(&(role, base.to_string())) {
            Some(count) => {
                let name = format!("{} ({})", base, count);
                *count += 1;
                name
            }
            None => {
                self.seen.insert((role, base.to_string()), 1);
                base.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::metadata::parse_str;

    #[test]
    fn repeats_get_a_sequence_number() {
        let mut names = NameRegistry::default();
        assert_eq!(names.generate("[P] Acme", Role::Idp), "[P] Acme");
        assert_eq!(names.generate("[P] Acme", Role::Idp), "[P] Acme (1)");
        assert_eq!(names.generate("[P] Acme", Role::Idp), "[P] Acme (2)");
    }

    #[test]
    fn roles_count_independently() {
        let mut names = NameRegistry::default();
        assert_eq!(names.generate("[P] Acme", Role::Idp), "[P] Acme");
        assert_eq!(names.generate("[P] Acme", Role::Idp), "[P] Acme (1)");
        assert_eq!(names.generate("[P] Acme", Role::Sp), "[P] Acme");
        assert_eq!(names.generate("[P] Acme", Role::Sp), "[P] Acme (1)");
        assert_eq!(names.generate("[P] Other", Role::Sp), "[P] Other");
    }

    #[test]
    fn base_name_falls_back_to_entity_id() {
        let doc = parse_str(
            r#"<EntityDescriptor xmlns="urn:oasis:names:tc:SAML:2.0:metadata" entityID="https://sp.example.org"/>"#,
        )
        .unwrap();
        let entity = EntityDescriptor::new(doc.root);
        assert_eq!(base_name(&entity), "[P] https://sp.example.org");
    }
}
