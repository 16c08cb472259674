#[cfg(test)]
mod tests {
    use crate::label_selector::*;
    use std::collections::BTreeMap;

    fn labels(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_blank_selector_matches_everything() {
        let engine = labels(&[("longhornvolume", "vol-1")]);
        assert!(matches_label_selector(&engine, "").unwrap());
        assert!(matches_label_selector(&engine, "   ").unwrap());
        assert!(matches_label_selector(&engine, " , ,").unwrap());
        assert!(matches_label_selector(&BTreeMap::new(), "").unwrap());
    }

    #[test]
    fn test_equality() {
        let engine = labels(&[("longhornvolume", "vol-1"), ("longhornnode", "node-1")]);

        assert!(matches_label_selector(&engine, "longhornvolume=vol-1").unwrap());
        assert!(matches_label_selector(&engine, "longhornvolume==vol-1").unwrap());
        assert!(matches_label_selector(&engine, " longhornvolume = vol-1 ").unwrap());
        assert!(!matches_label_selector(&engine, "longhornvolume=vol-2").unwrap());
        assert!(!matches_label_selector(&engine, "missing=vol-1").unwrap());
    }

    #[test]
    fn test_inequality_matches_absent_keys() {
        let engine = labels(&[("longhornnode", "node-1")]);

        assert!(matches_label_selector(&engine, "longhornnode!=node-2").unwrap());
        assert!(!matches_label_selector(&engine, "longhornnode!=node-1").unwrap());
        assert!(matches_label_selector(&engine, "longhornvolume!=vol-1").unwrap());
    }

    #[test]
    fn test_set_membership() {
        let engine = labels(&[("env", "production")]);

        assert!(matches_label_selector(&engine, "env in (production,staging)").unwrap());
        assert!(matches_label_selector(&engine, "env in ( staging , production )").unwrap());
        assert!(!matches_label_selector(&engine, "env in (development,testing)").unwrap());

        assert!(matches_label_selector(&engine, "env notin (development,testing)").unwrap());
        assert!(!matches_label_selector(&engine, "env notin (production)").unwrap());
        assert!(matches_label_selector(&engine, "tier notin (frontend)").unwrap());
        assert!(!matches_label_selector(&engine, "tier in (frontend)").unwrap());
    }

    #[test]
    fn test_existence() {
        let engine = labels(&[("longhornvolume", "vol-1")]);

        assert!(matches_label_selector(&engine, "longhornvolume").unwrap());
        assert!(!matches_label_selector(&engine, "recurring-job").unwrap());
        assert!(matches_label_selector(&engine, "!recurring-job").unwrap());
        assert!(!matches_label_selector(&engine, "!longhornvolume").unwrap());
    }

    #[test]
    fn test_requirements_are_anded() {
        let engine = labels(&[("longhornvolume", "vol-1"), ("env", "test")]);

        assert!(matches_label_selector(&engine, "longhornvolume=vol-1,env=test").unwrap());
        assert!(matches_label_selector(&engine, "longhornvolume,env in (test,dev)").unwrap());
        assert!(
            matches_label_selector(&engine, "longhornvolume=vol-1,env notin (prod),!stale").unwrap()
        );
        assert!(!matches_label_selector(&engine, "longhornvolume=vol-1,env=prod").unwrap());
    }

    #[test]
    fn test_unlabeled_object() {
        let none = BTreeMap::new();

        assert!(matches_label_selector(&none, "!longhornvolume").unwrap());
        assert!(matches_label_selector(&none, "env!=prod").unwrap());
        assert!(!matches_label_selector(&none, "longhornvolume").unwrap());
        assert!(!matches_label_selector(&none, "longhornvolume=vol-1").unwrap());
        assert!(!matches_label_selector(&none, "env in (prod)").unwrap());
    }

    #[test]
    fn test_parse_valid() {
        for selector in [
            "longhornvolume=vol-1",
            "env in (prod,staging)",
            "env notin (prod)",
            "!debug",
            "longhorn.io/component",
            "longhornvolume=vol-1,longhornnode=node-1",
        ] {
            assert!(parse_label_selector(selector).is_ok(), "{}", selector);
        }
    }

    #[test]
    fn test_parse_invalid() {
        for selector in [
            "env in prod",
            "env in (prod",
            "env notin prod",
            "env notin prod)",
            "=vol-1",
            "!",
            "bad key=vol-1",
            "!longhornvolume=vol-1",
            "!longhornvolume!=vol-1",
            "!env in (a)",
            "longhornvolume=vol-1,env in (a,b",
        ] {
            assert!(parse_label_selector(selector).is_err(), "{}", selector);
            assert!(matches_label_selector(&BTreeMap::new(), selector).is_err());
        }
    }

    #[test]
    fn test_negated_key_with_value_is_rejected() {
        let engine = labels(&[("!longhornvolume", "vol-1")]);
        let err = matches_label_selector(&engine, "!longhornvolume=vol-1").unwrap_err();
        assert!(err.contains("!longhornvolume=vol-1"), "{}", err);
    }

    #[test]
    fn test_compiled_selector_is_reusable() {
        let selector = parse_label_selector("longhornvolume in (vol-1,vol-2)").unwrap();

        assert!(selector_matches(&selector, &labels(&[("longhornvolume", "vol-1")])));
        assert!(selector_matches(&selector, &labels(&[("longhornvolume", "vol-2")])));
        assert!(!selector_matches(&selector, &labels(&[("longhornvolume", "vol-3")])));
    }
}
