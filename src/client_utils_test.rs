#[cfg(test)]
mod tests {
    use crate::client_utils::*;
    use crate::tracker::{GVK, GVR};
    use crate::Error;
    use serde_json::json;

    #[test]
    fn test_pluralize() {
        #[rustfmt::skip]
        let kinds = [
            ("Engine", "engines"),
            ("Replica", "replicas"),
            ("Volume", "volumes"),
            ("EngineImage", "engineimages"),
            ("InstanceManager", "instancemanagers"),
            ("BackingImage", "backingimages"),
            ("Node", "nodes"),
            ("Setting", "settings"),
            ("StorageClass", "storageclasses"),
            ("Ingress", "ingresses"),
            ("Policy", "policies"),
            ("Gateway", "gateways"),
            ("Box", "boxes"),
            ("Patch", "patches"),
            ("Mesh", "meshes"),
        ];

        for (kind, plural) in kinds {
            assert_eq!(pluralize(kind), plural, "pluralizing {}", kind);
        }
    }

    #[test]
    fn test_singular_kind() {
        assert_eq!(singular_kind("engines"), "Engine");
        assert_eq!(singular_kind("replicas"), "Replica");
        assert_eq!(singular_kind("policies"), "Policy");
        assert_eq!(singular_kind("storageclasses"), "Storageclass");
        assert_eq!(singular_kind("patches"), "Patch");
        assert_eq!(singular_kind("engine"), "Engine");
        assert_eq!(singular_kind(""), "");
    }

    #[test]
    fn test_gvk_to_gvr() {
        let gvk = GVK::new("longhorn.rancher.io", "v1alpha1", "Engine");
        assert_eq!(
            gvk_to_gvr(&gvk),
            GVR::new("longhorn.rancher.io", "v1alpha1", "engines")
        );
    }

    #[test]
    fn test_extract_gvk() {
        let gvk = extract_gvk(&json!({
            "apiVersion": "longhorn.rancher.io/v1alpha1",
            "kind": "Engine"
        }))
        .unwrap();
        assert_eq!(gvk, GVK::new("longhorn.rancher.io", "v1alpha1", "Engine"));

        let core = extract_gvk(&json!({ "apiVersion": "v1", "kind": "ConfigMap" })).unwrap();
        assert_eq!(core.group, "");
        assert_eq!(core.version, "v1");
        assert_eq!(core.api_version(), "v1");
    }

    #[test]
    fn test_extract_gvk_requires_type_meta() {
        let err = extract_gvk(&json!({ "kind": "Engine" })).unwrap_err();
        assert!(matches!(err, Error::Invalid(_)));

        let err = extract_gvk(&json!({ "apiVersion": "longhorn.rancher.io/v1alpha1" })).unwrap_err();
        assert!(matches!(err, Error::Invalid(_)));
    }
}
