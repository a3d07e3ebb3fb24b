//! End-to-end tests: editor sync client against the reconciler

use async_trait::async_trait;
use atelier_editor::{
    BuildSnapshot, EditorError, FlushOutcome, SyncClient, SyncClientConfig, SyncEngine, SyncError,
    SyncRequest, SyncResponse, SyncStatus, Transport, TransportError,
};
use atelier_workspace::{FileStore, NamespaceRegistry, Reconciler};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// In-process transport. Can be told to drop the next response after the
/// server applied the batch, the way a connection reset would.
struct Loopback {
    reconciler: Arc<Reconciler>,
    lose_next_response: AtomicBool,
}

impl Loopback {
    fn new(reconciler: Arc<Reconciler>) -> Self {
        Self {
            reconciler,
            lose_next_response: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl Transport for Loopback {
    async fn send(&self, request: &SyncRequest) -> Result<SyncResponse, TransportError> {
        let response = self.reconciler.apply(request).await;
        if self.lose_next_response.swap(false, Ordering::SeqCst) {
            return Err(TransportError::Request("connection reset".to_string()));
        }
        Ok(response)
    }

    async fn load(&self, build_id: &str) -> Result<BuildSnapshot, TransportError> {
        self.reconciler
            .snapshot(build_id)
            .await
            .map_err(|e| TransportError::Status {
                status: 404,
                body: e.to_string(),
            })
    }
}

async fn seeded(reconciler: &Reconciler) -> BuildSnapshot {
    let mut namespaces = BTreeMap::new();
    namespaces.insert("instances".to_string(), json!({}));
    namespaces.insert("props".to_string(), json!({}));
    reconciler.create_build("build", "project", namespaces).await.unwrap()
}

fn engine_from(snapshot: &BuildSnapshot) -> Mutex<SyncEngine> {
    let mut engine = SyncEngine::new();
    for (namespace, value) in &snapshot.namespaces {
        engine.register(namespace.clone(), value.clone()).unwrap();
    }
    Mutex::new(engine)
}

fn set(engine: &Mutex<SyncEngine>, key: &str, value: i64) {
    engine
        .lock()
        .unwrap()
        .run_transaction::<_, EditorError>(&["instances", "props"], |drafts| {
            drafts[0][key] = json!({ "component": "Box" });
            drafts[1][key] = json!(value);
            Ok(())
        })
        .unwrap();
}

fn client_at(reconciler: &Arc<Reconciler>, version: u64) -> (Arc<Loopback>, SyncClient<Arc<Loopback>>) {
    let transport = Arc::new(Loopback::new(reconciler.clone()));
    let client = SyncClient::new(
        transport.clone(),
        SyncClientConfig::new("build", "project", version),
    );
    (transport, client)
}

#[tokio::test]
async fn test_client_and_server_converge() {
    let reconciler = Arc::new(Reconciler::in_memory());
    let snapshot = seeded(&reconciler).await;
    let engine = engine_from(&snapshot);
    let (_, client) = client_at(&reconciler, snapshot.version);

    set(&engine, "a", 1);
    set(&engine, "b", 2);
    engine.lock().unwrap().undo().unwrap();

    assert_eq!(
        client.flush(&engine).await.unwrap(),
        FlushOutcome::Synced {
            version: 1,
            transactions: 1
        }
    );

    // Undo after flush travels as its own change
    engine.lock().unwrap().undo().unwrap();
    client.flush(&engine).await.unwrap();

    let server = reconciler.snapshot("build").await.unwrap();
    assert_eq!(server.version, 2);
    let local = engine.lock().unwrap();
    assert_eq!(Some(&server.namespaces["instances"]), local.value("instances"));
    assert_eq!(Some(&server.namespaces["props"]), local.value("props"));
    assert_eq!(server.namespaces["props"], json!({}));
}

#[tokio::test]
async fn test_lost_response_is_replayed_idempotently() {
    let reconciler = Arc::new(Reconciler::in_memory());
    let snapshot = seeded(&reconciler).await;
    let engine = engine_from(&snapshot);
    let (transport, client) = client_at(&reconciler, snapshot.version);

    // Bring the build to version 5
    for i in 0..5 {
        set(&engine, &format!("k{}", i), i);
        client.flush(&engine).await.unwrap();
    }
    assert_eq!(client.version().await, 5);

    // The server applies 5 -> 6 but the client never hears back
    set(&engine, "lost", 99);
    transport.lose_next_response.store(true, Ordering::SeqCst);
    let err = client.flush(&engine).await.unwrap_err();
    assert!(matches!(err, SyncError::Transport(_)));
    assert_eq!(reconciler.snapshot("build").await.unwrap().version, 6);

    // Resend at version 5 is recognized by its last transaction id
    let outcome = client.flush(&engine).await.unwrap();
    assert_eq!(
        outcome,
        FlushOutcome::Synced {
            version: 6,
            transactions: 1
        }
    );

    let server = reconciler.snapshot("build").await.unwrap();
    assert_eq!(server.version, 6);
    assert_eq!(server.namespaces["props"]["lost"], json!(99));

    // And syncing carries on from there
    set(&engine, "after", 7);
    client.flush(&engine).await.unwrap();
    assert_eq!(reconciler.snapshot("build").await.unwrap().version, 7);
}

#[tokio::test]
async fn test_concurrent_session_conflict_and_reload() {
    let reconciler = Arc::new(Reconciler::in_memory());
    let snapshot = seeded(&reconciler).await;

    let alice_engine = engine_from(&snapshot);
    let (_, alice) = client_at(&reconciler, snapshot.version);
    let bob_engine = engine_from(&snapshot);
    let (_, bob) = client_at(&reconciler, snapshot.version);

    // Both reach version 5 together
    for i in 0..5 {
        set(&alice_engine, &format!("k{}", i), i);
        alice.flush(&alice_engine).await.unwrap();
    }
    bob.reload(&bob_engine).await.unwrap();
    assert_eq!(bob.version().await, 5);

    // Alice moves the build to 6
    set(&alice_engine, "alice", 1);
    alice.flush(&alice_engine).await.unwrap();

    // Bob is still at 5
    set(&bob_engine, "bob", 2);
    let err = bob.flush(&bob_engine).await.unwrap_err();
    match err {
        SyncError::VersionMismatch { client_version, message } => {
            assert_eq!(client_version, 5);
            assert!(message.ends_with("6 != 5"), "{}", message);
        }
        other => panic!("expected a version mismatch, got {:?}", other),
    }
    assert!(matches!(bob.status().await, SyncStatus::Conflicted(_)));

    // Bob's optimistic edit is still visible locally until reload
    assert_eq!(bob_engine.lock().unwrap().value("props").unwrap()["bob"], json!(2));

    bob.reload(&bob_engine).await.unwrap();
    assert_eq!(bob.version().await, 6);
    let reloaded = bob_engine.lock().unwrap().value("props").cloned().unwrap();
    assert_eq!(reloaded["alice"], json!(1));
    assert!(reloaded.get("bob").is_none());
}

#[tokio::test]
async fn test_reload_resets_namespaces_the_server_never_stored() {
    let reconciler = Arc::new(Reconciler::in_memory());
    let mut seed = BTreeMap::new();
    seed.insert("props".to_string(), json!({}));
    reconciler.create_build("build", "project", seed).await.unwrap();

    let session = || {
        let mut engine = SyncEngine::new();
        engine.register("props", json!({})).unwrap();
        engine.register("pages", json!({})).unwrap();
        Mutex::new(engine)
    };
    let alice_engine = session();
    let (_, alice) = client_at(&reconciler, 0);
    let bob_engine = session();
    let (_, bob) = client_at(&reconciler, 0);

    alice_engine
        .lock()
        .unwrap()
        .run_transaction::<_, EditorError>(&["props"], |drafts| {
            drafts[0]["alice"] = json!(1);
            Ok(())
        })
        .unwrap();
    alice.flush(&alice_engine).await.unwrap();

    bob_engine
        .lock()
        .unwrap()
        .run_transaction::<_, EditorError>(&["pages"], |drafts| {
            drafts[0]["home"] = json!({ "name": "Home" });
            Ok(())
        })
        .unwrap();
    assert!(matches!(
        bob.flush(&bob_engine).await,
        Err(SyncError::VersionMismatch { .. })
    ));

    let snapshot = bob.reload(&bob_engine).await.unwrap();
    assert!(!snapshot.namespaces.contains_key("pages"));
    assert_eq!(bob_engine.lock().unwrap().value("pages"), Some(&json!({})));

    // Editing the reset namespace syncs cleanly
    bob_engine
        .lock()
        .unwrap()
        .run_transaction::<_, EditorError>(&["pages"], |drafts| {
            drafts[0]["home"] = json!({ "name": "Start" });
            Ok(())
        })
        .unwrap();
    bob.flush(&bob_engine).await.unwrap();
    assert_eq!(bob.status().await, SyncStatus::Active);

    let server = reconciler.snapshot("build").await.unwrap();
    assert_eq!(server.namespaces["pages"], json!({ "home": { "name": "Start" } }));
}

#[tokio::test]
async fn test_unknown_namespace_fails_the_client() {
    let reconciler = Arc::new(Reconciler::new(
        Arc::new(atelier_workspace::MemoryStore::new()),
        NamespaceRegistry::with_generic(["props"]),
    ));
    reconciler
        .create_build("build", "project", BTreeMap::new())
        .await
        .unwrap();

    let mut engine = SyncEngine::new();
    engine.register("props", json!({})).unwrap();
    engine.register("drafts", json!({})).unwrap();
    let engine = Mutex::new(engine);
    let (_, client) = client_at(&reconciler, 0);

    engine
        .lock()
        .unwrap()
        .run_transaction::<_, EditorError>(&["drafts"], |drafts| {
            drafts[0]["x"] = json!(1);
            Ok(())
        })
        .unwrap();

    let err = client.flush(&engine).await.unwrap_err();
    assert!(matches!(&err, SyncError::Rejected(message) if message.contains("drafts")));
    assert!(matches!(client.status().await, SyncStatus::Failed(_)));
    assert_eq!(reconciler.snapshot("build").await.unwrap().version, 0);
}

#[tokio::test]
async fn test_file_store_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FileStore::open(dir.path()).await.unwrap());
    let reconciler = Arc::new(Reconciler::new(store.clone(), NamespaceRegistry::default()));
    let snapshot = seeded(&reconciler).await;
    let engine = engine_from(&snapshot);
    let (_, client) = client_at(&reconciler, snapshot.version);

    set(&engine, "persisted", 1);
    client.flush(&engine).await.unwrap();

    // A fresh server over the same directory sees the committed state
    let reopened = Reconciler::new(
        Arc::new(FileStore::open(dir.path()).await.unwrap()),
        NamespaceRegistry::default(),
    );
    let server = reopened.snapshot("build").await.unwrap();
    assert_eq!(server.version, 1);
    assert_eq!(server.namespaces["props"]["persisted"], json!(1));
}
