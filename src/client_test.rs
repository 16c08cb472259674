//! Tests for the API-server backed Engine client, run against the mock
//! service so requests go through a real `kube::Client`.

#[cfg(test)]
mod tests {
    use crate::client::*;
    use crate::engine::{Engine, EngineSpec, EngineStatus};
    use crate::options::{DeleteOptions, GetOptions, ListOptions, PatchType};
    use crate::{Clientset, ClientsetBuilder, Verb};
    use futures::StreamExt;
    use kube::api::WatchEvent;
    use kube::ResourceExt;
    use tokio_test::{assert_err, assert_ok};

    const NS: &str = "longhorn-system";

    fn engine(name: &str, volume: &str) -> Engine {
        let mut e = Engine::new(
            name,
            EngineSpec {
                volume_name: volume.to_string(),
                node_id: "node-1".to_string(),
                desire_state: "running".to_string(),
                ..Default::default()
            },
        );
        e.metadata.labels = Some([("longhornvolume".to_string(), volume.to_string())].into());
        e
    }

    fn real_client(clientset: &Clientset) -> LonghornV1alpha1Client {
        LonghornV1alpha1Client::new(clientset.kube_client())
    }

    // ============================================================================
    // CRUD
    // ============================================================================

    #[tokio::test]
    async fn test_create_get_update_delete() {
        let clientset = Clientset::new();
        let engines = real_client(&clientset).engines(NS);

        let created = assert_ok!(engines.create(&engine("e1", "vol-1")).await);
        assert_eq!(created.metadata.namespace.as_deref(), Some(NS));
        assert_eq!(created.metadata.resource_version.as_deref(), Some("1"));

        let fetched = assert_ok!(engines.get("e1", &GetOptions::default()).await);
        assert_eq!(fetched, created);

        let mut changed = fetched.clone();
        changed.spec.desire_state = "stopped".to_string();
        let updated = assert_ok!(engines.update(&changed).await);
        assert_eq!(updated.spec.desire_state, "stopped");
        assert_eq!(updated.metadata.resource_version.as_deref(), Some("2"));

        assert_ok!(engines.delete("e1", &DeleteOptions::default()).await);
        let err = assert_err!(engines.get("e1", &GetOptions::default()).await);
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_errors_are_classified() {
        let clientset = Clientset::new();
        let engines = real_client(&clientset).engines(NS);

        let err = assert_err!(engines.get("missing", &GetOptions::default()).await);
        assert!(err.is_not_found(), "{}", err);

        let created = assert_ok!(engines.create(&engine("e1", "vol-1")).await);
        let err = assert_err!(engines.create(&engine("e1", "vol-1")).await);
        assert!(err.is_already_exists(), "{}", err);

        assert_ok!(engines.update(&created).await);
        let err = assert_err!(engines.update(&created).await);
        assert!(err.is_conflict(), "{}", err);

        let err = assert_err!(engines.delete("missing", &DeleteOptions::default()).await);
        assert!(err.is_not_found(), "{}", err);

        let err = assert_err!(
            engines
                .patch("e1", PatchType::Json, br#"[{"op":"remove","path":"/nope"}]"#, &[])
                .await
        );
        assert!(err.is_invalid(), "{}", err);
    }

    #[tokio::test]
    async fn test_update_requires_name() {
        let clientset = Clientset::new();
        let engines = real_client(&clientset).engines(NS);

        let nameless = Engine::new("", EngineSpec::default());
        let err = assert_err!(engines.update(&nameless).await);
        assert!(err.is_invalid());
    }

    #[tokio::test]
    async fn test_update_status_targets_subresource() {
        let clientset = ClientsetBuilder::new()
            .with_status_subresource::<Engine>()
            .build()
            .unwrap();
        let engines = real_client(&clientset).engines(NS);
        let created = assert_ok!(engines.create(&engine("e1", "vol-1")).await);

        let mut reported = created.clone();
        reported.spec.node_id = "node-7".to_string();
        reported.status = Some(EngineStatus {
            current_state: "running".to_string(),
            endpoint: "/dev/longhorn/vol-1".to_string(),
            ..Default::default()
        });
        let updated = assert_ok!(engines.update_status(&reported).await);

        assert_eq!(updated.spec.node_id, "node-1");
        assert_eq!(
            updated.status.map(|s| s.endpoint),
            Some("/dev/longhorn/vol-1".to_string())
        );
    }

    #[tokio::test]
    async fn test_list_uses_server_side_selector() {
        let clientset = ClientsetBuilder::new()
            .with_objects(vec![
                namespaced(engine("e1", "vol-1")),
                namespaced(engine("e2", "vol-2")),
                namespaced(engine("e3", "vol-1")),
            ])
            .build()
            .unwrap();
        let engines = real_client(&clientset).engines(NS);

        let list = assert_ok!(
            engines
                .list(&ListOptions::default().labels("longhornvolume in (vol-1)"))
                .await
        );
        let names: Vec<String> = list.items.iter().map(|e| e.name_any()).collect();
        assert_eq!(names, vec!["e1", "e3"]);

        let all = assert_ok!(engines.list(&ListOptions::default()).await);
        assert_eq!(all.items.len(), 3);
    }

    #[tokio::test]
    async fn test_list_all_namespaces() {
        let clientset = Clientset::new();
        let client = real_client(&clientset);
        assert_ok!(client.engines("a").create(&engine("e1", "vol-1")).await);
        assert_ok!(client.engines("b").create(&engine("e2", "vol-2")).await);

        let all = assert_ok!(client.engines("").list(&ListOptions::default()).await);
        assert_eq!(all.items.len(), 2);
        let in_b = assert_ok!(client.engines("b").list(&ListOptions::default()).await);
        assert_eq!(in_b.items.len(), 1);
    }

    #[tokio::test]
    async fn test_delete_collection() {
        let clientset = Clientset::new();
        let engines = real_client(&clientset).engines(NS);
        for (name, volume) in [("e1", "vol-1"), ("e2", "vol-2"), ("e3", "vol-1")] {
            assert_ok!(engines.create(&engine(name, volume)).await);
        }

        assert_ok!(
            engines
                .delete_collection(
                    &DeleteOptions::default(),
                    &ListOptions::default().labels("longhornvolume=vol-1"),
                )
                .await
        );

        let left = assert_ok!(engines.list(&ListOptions::default()).await);
        let names: Vec<String> = left.items.iter().map(|e| e.name_any()).collect();
        assert_eq!(names, vec!["e2"]);
    }

    #[tokio::test]
    async fn test_patch_types() {
        let clientset = Clientset::new();
        let engines = real_client(&clientset).engines(NS);
        assert_ok!(engines.create(&engine("e1", "vol-1")).await);

        let merged = assert_ok!(
            engines
                .patch("e1", PatchType::Merge, br#"{"spec":{"desireState":"stopped"}}"#, &[])
                .await
        );
        assert_eq!(merged.spec.desire_state, "stopped");

        let strategic = assert_ok!(
            engines
                .patch(
                    "e1",
                    PatchType::StrategicMerge,
                    br#"{"spec":{"engineImage":"longhornio/longhorn-engine:v0.4.0"}}"#,
                    &[],
                )
                .await
        );
        assert_eq!(strategic.spec.engine_image, "longhornio/longhorn-engine:v0.4.0");
        assert_eq!(strategic.spec.desire_state, "stopped");

        let json = assert_ok!(
            engines
                .patch(
                    "e1",
                    PatchType::Json,
                    br#"[{"op":"add","path":"/metadata/labels/env","value":"test"}]"#,
                    &[],
                )
                .await
        );
        assert_eq!(json.labels().get("env").map(String::as_str), Some("test"));

        let applied = assert_ok!(
            engines
                .patch(
                    "e1",
                    PatchType::Apply,
                    b"apiVersion: longhorn.rancher.io/v1alpha1\nkind: Engine\nspec:\n  nodeID: node-2\n",
                    &[],
                )
                .await
        );
        assert_eq!(applied.spec.node_id, "node-2");

        let status = assert_ok!(
            engines
                .patch(
                    "e1",
                    PatchType::Merge,
                    br#"{"status":{"currentState":"stopped"}}"#,
                    &["status"],
                )
                .await
        );
        assert_eq!(
            status.status.map(|s| s.current_state),
            Some("stopped".to_string())
        );
    }

    #[tokio::test]
    async fn test_malformed_patch_is_rejected_before_sending() {
        let clientset = Clientset::new();
        let engines = real_client(&clientset).engines(NS);

        let err = assert_err!(engines.patch("e1", PatchType::Merge, b"[1, 2]", &[]).await);
        assert!(err.is_invalid());
    }

    // ============================================================================
    // Watch
    // ============================================================================

    #[tokio::test]
    async fn test_watch_replays_then_streams() {
        let clientset = ClientsetBuilder::new()
            .with_object(namespaced(engine("e1", "vol-1")))
            .build()
            .unwrap();
        let engines = real_client(&clientset).engines(NS);

        let mut events = assert_ok!(engines.watch(ListOptions::default()).await);
        match events.next().await {
            Some(Ok(WatchEvent::Added(e))) => assert_eq!(e.name_any(), "e1"),
            _ => panic!("expected the existing engine as ADDED"),
        }

        let created = assert_ok!(engines.create(&engine("e2", "vol-2")).await);
        match events.next().await {
            Some(Ok(WatchEvent::Added(e))) => assert_eq!(e, created),
            _ => panic!("expected an ADDED event for e2"),
        }

        assert_ok!(engines.delete("e2", &DeleteOptions::default()).await);
        match events.next().await {
            Some(Ok(WatchEvent::Deleted(e))) => assert_eq!(e.name_any(), "e2"),
            _ => panic!("expected a DELETED event for e2"),
        }
    }

    #[tokio::test]
    async fn test_watch_from_resource_version_skips_replay() {
        let clientset = ClientsetBuilder::new()
            .with_object(namespaced(engine("e1", "vol-1")))
            .build()
            .unwrap();
        let engines = real_client(&clientset).engines(NS);

        let current = clientset.tracker().current_resource_version();
        let mut events = assert_ok!(engines.watch(ListOptions::default().at(current)).await);

        assert_ok!(engines.create(&engine("e2", "vol-2")).await);
        match events.next().await {
            Some(Ok(WatchEvent::Added(e))) => assert_eq!(e.name_any(), "e2"),
            _ => panic!("expected only the new engine"),
        }
    }

    #[tokio::test]
    async fn test_watch_applies_label_selector() {
        let clientset = Clientset::new();
        let engines = real_client(&clientset).engines(NS);

        let mut events = assert_ok!(
            engines
                .watch(ListOptions::default().labels("longhornvolume=vol-2"))
                .await
        );
        assert_ok!(engines.create(&engine("e1", "vol-1")).await);
        assert_ok!(engines.create(&engine("e2", "vol-2")).await);

        match events.next().await {
            Some(Ok(WatchEvent::Added(e))) => assert_eq!(e.name_any(), "e2"),
            _ => panic!("expected only the matching engine"),
        }
    }

    #[tokio::test]
    async fn test_watch_reports_engines_leaving_and_entering_selector() {
        let clientset = Clientset::new();
        let engines = real_client(&clientset).engines(NS);
        let mut events = assert_ok!(
            engines
                .watch(ListOptions::default().labels("longhornvolume=vol-1"))
                .await
        );

        let created = assert_ok!(engines.create(&engine("e1", "vol-1")).await);
        match events.next().await {
            Some(Ok(WatchEvent::Added(e))) => assert_eq!(e, created),
            _ => panic!("expected an ADDED event for e1"),
        }

        let mut relabeled = created.clone();
        relabeled.labels_mut().insert("longhornvolume".into(), "vol-2".into());
        let relabeled = assert_ok!(engines.update(&relabeled).await);
        match events.next().await {
            Some(Ok(WatchEvent::Deleted(e))) => assert_eq!(e, relabeled),
            _ => panic!("expected a DELETED event once e1 stops matching"),
        }

        let mut restored = relabeled.clone();
        restored.labels_mut().insert("longhornvolume".into(), "vol-1".into());
        let restored = assert_ok!(engines.update(&restored).await);
        match events.next().await {
            Some(Ok(WatchEvent::Added(e))) => assert_eq!(e, restored),
            _ => panic!("expected an ADDED event once e1 matches again"),
        }
    }

    // ============================================================================
    // Shared session
    // ============================================================================

    #[tokio::test]
    async fn test_real_and_fake_clients_share_state() {
        let clientset = Clientset::new();
        let fake = clientset.longhorn_v1alpha1().engines(NS);
        let real = real_client(&clientset).engines(NS);

        assert_ok!(fake.create(&engine("e1", "vol-1")).await);
        let fetched = assert_ok!(real.get("e1", &GetOptions::default()).await);
        assert_eq!(fetched.spec.volume_name, "vol-1");

        // Only calls through the fake are recorded
        let verbs: Vec<Verb> = clientset.actions().iter().map(|a| a.verb).collect();
        assert_eq!(verbs, vec![Verb::Create]);
    }

    #[tokio::test]
    async fn test_namespace_is_bound() {
        let clientset = Clientset::new();
        let engines = real_client(&clientset).engines(NS);
        assert_eq!(engines.namespace(), NS);
    }

    fn namespaced(mut e: Engine) -> Engine {
        e.metadata.namespace = Some(NS.to_string());
        e
    }
}
