//! Every owner with at least one configuration has exactly one default, whatever sequence of
//! registry operations ran.

use std::sync::Arc;
use stowage_core::models::{BackendKind, CallContext, Caller, StorageConfigDraft};
use stowage_core::AppError;
use stowage_db::MemoryConfigStore;
use stowage_services::{Auditor, ConfigRegistry};

fn draft(bucket: &str) -> StorageConfigDraft {
    StorageConfigDraft {
        name: bucket.to_string(),
        backend_kind: BackendKind::Cloud,
        access_key_id: "AKIAEXAMPLE".to_string(),
        secret_access_key: "wJalrXUtnFEMI".to_string(),
        region: "eu-west-1".to_string(),
        bucket_name: bucket.to_string(),
        endpoint_url: None,
        use_tls: true,
    }
}

async fn assert_single_default(registry: &ConfigRegistry, owner: &str) {
    let configs = registry.list(owner).await.unwrap();
    if configs.is_empty() {
        return;
    }
    let defaults = configs.iter().filter(|c| c.is_default).count();
    assert_eq!(defaults, 1, "owner {} has {} defaults", owner, defaults);
}

#[tokio::test]
async fn test_default_invariant_across_operations() {
    let registry = ConfigRegistry::new(Arc::new(MemoryConfigStore::new()), Auditor::disabled());
    let alice = CallContext::new(Caller::user("alice"));
    let bob = CallContext::new(Caller::user("bob"));

    let mut ids = Vec::new();
    for i in 0..4 {
        ids.push(registry.create(&alice, draft(&format!("a-{}", i))).await.unwrap().id);
        assert_single_default(&registry, "alice").await;
    }
    registry.create(&bob, draft("b-0")).await.unwrap();

    registry.set_default(&alice, &ids[2]).await.unwrap();
    assert_single_default(&registry, "alice").await;

    assert!(matches!(
        registry.set_default(&bob, &ids[1]).await,
        Err(AppError::ConfigNotFound(_))
    ));

    // Deleting the default promotes the oldest remaining record.
    let promoted = registry.delete(&alice, &ids[2]).await.unwrap();
    assert_eq!(promoted.as_deref(), Some(ids[0].as_str()));
    assert_single_default(&registry, "alice").await;

    registry.delete(&alice, &ids[3]).await.unwrap();
    registry.delete(&alice, &ids[0]).await.unwrap();
    assert_single_default(&registry, "alice").await;

    assert!(matches!(
        registry.delete(&alice, &ids[1]).await,
        Err(AppError::LastConfig)
    ));
    assert_eq!(registry.get_default("alice").await.unwrap().id, ids[1]);
    assert_single_default(&registry, "bob").await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_readers_never_observe_zero_or_two_defaults() {
    let registry = ConfigRegistry::new(Arc::new(MemoryConfigStore::new()), Auditor::disabled());
    let alice = CallContext::new(Caller::user("alice"));
    let mut ids = Vec::new();
    for i in 0..3 {
        ids.push(registry.create(&alice, draft(&format!("a-{}", i))).await.unwrap().id);
    }

    let toggler = {
        let registry = registry.clone();
        let alice = alice.clone();
        tokio::spawn(async move {
            for round in 0..200 {
                registry
                    .set_default(&alice, &ids[round % ids.len()])
                    .await
                    .unwrap();
            }
        })
    };
    let churner = {
        let registry = registry.clone();
        let alice = alice.clone();
        tokio::spawn(async move {
            for round in 0..100 {
                let extra = registry
                    .create(&alice, draft(&format!("extra-{}", round)))
                    .await
                    .unwrap();
                registry.set_default(&alice, &extra.id).await.unwrap();
                registry.delete(&alice, &extra.id).await.unwrap();
            }
        })
    };

    let mut readers = Vec::new();
    for _ in 0..4 {
        let registry = registry.clone();
        readers.push(tokio::spawn(async move {
            for _ in 0..200 {
                let configs = registry.list("alice").await.unwrap();
                let defaults = configs.iter().filter(|c| c.is_default).count();
                assert_eq!(defaults, 1, "list observed {} defaults", defaults);
                assert!(registry.get_default("alice").await.unwrap().is_default);
                tokio::task::yield_now().await;
            }
        }));
    }

    toggler.await.unwrap();
    churner.await.unwrap();
    for reader in readers {
        reader.await.unwrap();
    }
    assert_single_default(&registry, "alice").await;
}
