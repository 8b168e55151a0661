//! Scenario tests: configuration-driven runs, shared sessions, recovery

use std::sync::Arc;

use blocksync_core::identity::relative_file_path;
use blocksync_core::{
    AffinityExecutor, ArtifactDescriptor, ArtifactKind, BatchOrchestrator, ExportOptions,
    SessionManager, SyncConfig,
};
use blocksync_fs::NormalizedPath;
use blocksync_test_utils::{FakeEnvironment, TestRoot, open_session};
use pretty_assertions::assert_eq;

fn recipe(name: &str) -> ArtifactDescriptor {
    ArtifactDescriptor::new("PLC_1", "Recipes", name, ArtifactKind::DataBlock)
}

fn plant(count: usize) -> FakeEnvironment {
    (0..count).fold(FakeEnvironment::new("V19"), |env, i| {
        env.with_artifact(
            &recipe(&format!("Recipe{i:02}")),
            &format!("<Block Name=\"Recipe{i:02}\" Built=\"2026-05-0{}\"/>", i % 9 + 1),
        )
    })
}

fn selection(count: usize) -> Vec<ArtifactDescriptor> {
    (0..count).map(|i| recipe(&format!("Recipe{i:02}"))).collect()
}

#[tokio::test]
async fn test_config_file_drives_export() {
    let root = TestRoot::new();
    root.write(
        "meta/config.toml",
        r#"
[export]
incremental = false

[[export.scrub]]
pattern = 'Built="[^"]*"'
replacement = 'Built=""'

[executor]
thread_name = "plc-affinity"
queue_capacity = 16

[io]
fsync = false
"#,
    );
    let config = SyncConfig::load(&NormalizedPath::new(root.path())).unwrap();

    let executor = AffinityExecutor::start(config.executor_config()).unwrap();
    let thread_name = executor
        .submit(|| std::thread::current().name().map(str::to_string))
        .await
        .unwrap();
    assert_eq!(thread_name.as_deref(), Some("plc-affinity"));

    let env = plant(3);
    let session = SessionManager::new(Arc::new(executor));
    session.attach(env.connector()).await.unwrap();
    session.open_project("Line1.ap19").await.unwrap();
    let orchestrator = BatchOrchestrator::new(session);
    let options = config.export_options().unwrap();

    let first = orchestrator
        .export_batch(root.path(), &selection(3), &options, None)
        .await
        .unwrap();
    let second = orchestrator
        .export_batch(root.path(), &selection(3), &options, None)
        .await
        .unwrap();

    assert_eq!(first.exported(), 3);
    // incremental = false: nothing is skipped even though nothing changed
    assert_eq!(second.exported(), 3);
    assert!(root.read(&relative_file_path(&recipe("Recipe00"))).contains(r#"Built="""#));
}

#[tokio::test]
async fn test_concurrent_batches_share_one_affinity_thread() {
    let env = plant(12);
    let session = open_session(&env).await;
    let left = BatchOrchestrator::new(session.clone());
    let right = BatchOrchestrator::new(session);
    let (left_root, right_root) = (TestRoot::new(), TestRoot::new());
    let items = selection(12);
    let options = ExportOptions::default();

    let (a, b) = tokio::join!(
        left.export_batch(left_root.path(), &items, &options, None),
        right.export_batch(right_root.path(), &items, &options, None),
    );

    assert_eq!(a.unwrap().exported(), 12);
    assert_eq!(b.unwrap().exported(), 12);
    assert_eq!(env.reads().len(), 24);
    assert_eq!(left_root.xml_files(), right_root.xml_files());
}

#[tokio::test]
async fn test_deleted_export_tree_is_rebuilt() {
    let env = plant(4);
    let orchestrator = BatchOrchestrator::new(open_session(&env).await);
    let root = TestRoot::new();
    let options = ExportOptions::default();

    orchestrator
        .export_batch(root.path(), &selection(4), &options, None)
        .await
        .unwrap();
    std::fs::remove_dir_all(root.join("PLC_1")).unwrap();
    root.remove("meta/manifest.json");

    let rebuilt = orchestrator
        .export_batch(root.path(), &selection(4), &options, None)
        .await
        .unwrap();

    assert_eq!(rebuilt.exported(), 4);
    assert_eq!(root.xml_files().len(), 4);
}

#[tokio::test]
async fn test_renamed_artifact_leaves_old_file_and_prunes_nothing() {
    let env = plant(2);
    let orchestrator = BatchOrchestrator::new(open_session(&env).await);
    let root = TestRoot::new();
    let options = ExportOptions::default();
    orchestrator
        .export_batch(root.path(), &selection(2), &options, None)
        .await
        .unwrap();

    // Rename Recipe01 -> Recipe01b in the project.
    let old = recipe("Recipe01");
    let renamed = recipe("Recipe01b");
    let content = env.content(&old).unwrap();
    env.remove_artifact(&old);
    env.set_content(&renamed, &content);

    let result = orchestrator
        .export_batch(root.path(), &[recipe("Recipe00"), renamed.clone()], &options, None)
        .await
        .unwrap();

    assert_eq!(result.skipped(), 1);
    assert_eq!(result.exported(), 1);
    assert_eq!(result.pruned(), 0);
    // Export overwrites, it never deletes: the old file stays.
    root.assert_file_exists(&relative_file_path(&old));
    root.assert_file_exists(&relative_file_path(&renamed));
}
