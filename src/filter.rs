use std::collections::BTreeSet;

/// Decides whether an entity is left alone.
///
/// `exclude` is applied first and always wins. A non-empty `include` then
/// restricts processing to the entities it lists; an empty one restricts
/// nothing.
pub fn skip(entity_id: &str, include: &BTreeSet<String>, exclude: &BTreeSet<String>) -> bool {
    if exclude.contains(entity_id) {
        return true;
    }
    !include.is_empty() && !include.contains(entity_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(ids: &[&str]) -> BTreeSet<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn no_filters_keeps_all() {
        assert!(!skip("urn:a", &set(&[]), &set(&[])));
    }

    #[test]
    fn unlisted_entity_is_kept_without_include() {
        assert!(!skip("urn:a", &set(&[]), &set(&["urn:b"])));
    }

    #[test]
    fn exclude_wins_over_include() {
        assert!(skip("urn:a", &set(&["urn:a"]), &set(&["urn:a"])));
        assert!(skip("urn:a", &set(&[]), &set(&["urn:a"])));
    }

    #[test]
    fn include_restricts() {
        let include = set(&["urn:a"]);
        assert!(!skip("urn:a", &include, &set(&[])));
        assert!(skip("urn:b", &include, &set(&[])));
    }
}
