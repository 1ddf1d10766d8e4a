//! Canonical metric key construction (spec.md §3 Metric Record: "Metric
//! keys incorporate tag sets in canonical sorted form so two identical tag
//! sets produce the same key").

/// Build `"name{tag1=v1,tag2=v2,...}"` with tags sorted lexicographically
/// by key. Two calls with the same name and the same tag pairs (in any
/// order) always produce an identical string.
pub fn canonical_key(name: &str, tags: &[(&str, &str)]) -> String {
    if tags.is_empty() {
        return name.to_string();
    }
    let mut sorted: Vec<&(&str, &str)> = tags.iter().collect();
    sorted.sort_by_key(|(k, _)| *k);
    let joined = sorted
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(",");
    format!("{name}{{{joined}}}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_tags_is_bare_name() {
        assert_eq!(canonical_key("requests", &[]), "requests");
    }

    #[test]
    fn tag_order_does_not_affect_key() {
        let a = canonical_key("requests", &[("method", "GET"), ("path", "/x")]);
        let b = canonical_key("requests", &[("path", "/x"), ("method", "GET")]);
        assert_eq!(a, b);
        assert_eq!(a, "requests{method=GET,path=/x}");
    }
}
