//! End-to-end export -> import round trip
//!
//! Exercises the complete flow across crates: scan -> export -> files on
//! disk -> import into a second project -> re-export byte for byte.

use std::fs;

use assert_fs::TempDir;
use assert_fs::prelude::*;
use blocksync_content::ContentNormalizer;
use blocksync_core::identity::relative_file_path;
use blocksync_core::{
    ArtifactDescriptor, ArtifactKind, BatchOrchestrator, ExportOptions, FilterProfile,
    ImportOptions,
};
use blocksync_test_utils::{FakeEnvironment, TestRoot, open_session};
use predicates::prelude::*;
use pretty_assertions::assert_eq;

fn alarms() -> ArtifactDescriptor {
    ArtifactDescriptor::new("PLC_1", "Types/Common", "Alarms", ArtifactKind::DataType)
}

fn motor() -> ArtifactDescriptor {
    ArtifactDescriptor::new("PLC_1", "Blocks/Drives", "Motor", ArtifactKind::FunctionBlock)
}

fn motor_data() -> ArtifactDescriptor {
    ArtifactDescriptor::new("PLC_1", "Blocks/Drives", "MotorData", ArtifactKind::DataBlock)
}

fn main_ob() -> ArtifactDescriptor {
    ArtifactDescriptor::new("PLC_1", "", "Main", ArtifactKind::OrganizationBlock)
}

fn io_tags() -> ArtifactDescriptor {
    ArtifactDescriptor::new("PLC_1", "Tags", "IO", ArtifactKind::TagTable)
}

/// Source project as the environment serializes it: noisy formatting,
/// attributes in arbitrary order, CRLF line endings.
fn source_project() -> FakeEnvironment {
    FakeEnvironment::new("V19")
        .with_artifact(
            &alarms(),
            "<?xml version='1.0' encoding='utf-8'?>\r\n<Type Version=\"2\" Name=\"Alarms\">\r\n  <Member Type=\"Bool\" Name=\"Overheat\"/>\r\n</Type>\r\n",
        )
        .with_artifact(
            &motor(),
            "<Block Name=\"Motor\" Kind=\"FB\">\n    <Uses Type=\"Alarms\"/>\n    <Network Index=\"1\">A &amp; B</Network>\n</Block>",
        )
        .with_artifact(
            &motor_data(),
            "<Block Instance=\"Motor\" Name=\"MotorData\" Kind=\"DB\"/>",
        )
        .with_artifact(&main_ob(), "<Block Kind=\"OB\" Name=\"Main\"><Call Block=\"Motor\"/></Block>")
        .with_artifact(&io_tags(), "<Tags><Tag Name=\"Start\" Address=\"%I0.0\"/></Tags>")
}

/// Target project with the structure in place but no artifacts.
fn empty_target() -> FakeEnvironment {
    FakeEnvironment::new("V19")
        .with_group("PLC_1", "Types/Common")
        .with_group("PLC_1", "Blocks/Drives")
        .with_group("PLC_1", "Tags")
}

#[tokio::test]
async fn test_scan_export_import_round_trip() {
    let source = source_project();
    let exporter = BatchOrchestrator::new(open_session(&source).await);
    let root = TempDir::new().unwrap();

    let selection = exporter.session().scan(FilterProfile::all()).await.unwrap();
    assert_eq!(selection.len(), 5);
    let exported = exporter
        .export_batch(root.path(), &selection, &ExportOptions::default(), None)
        .await
        .unwrap();
    assert_eq!(exported.exported(), 5);

    let motor_file = root.child(relative_file_path(&motor()));
    motor_file.assert(predicate::path::is_file());
    motor_file.assert(predicate::str::contains("A &amp; B"));
    root.child("meta/manifest.json").assert(predicate::str::contains("\"entries\""));
    root.child("meta/environment-version.txt")
        .assert(predicate::str::starts_with("environment=V19\n"));

    let target = empty_target();
    let importer = BatchOrchestrator::new(open_session(&target).await);
    let imported = importer
        .import_batch(root.path(), &selection, &ImportOptions::default(), None)
        .await
        .unwrap();

    assert_eq!(imported.imported(), 5);
    assert!(imported.is_clean());
    assert!(!imported.environment_mismatch());

    let normalizer = ContentNormalizer::new();
    for descriptor in &selection {
        let original = normalizer.normalize(&source.content(descriptor).unwrap()).unwrap();
        assert_eq!(target.content(descriptor).unwrap(), original, "{descriptor}");
    }
}

#[tokio::test]
async fn test_re_export_of_imported_project_is_byte_identical() {
    let source = source_project();
    let first_root = TestRoot::new();
    let exporter = BatchOrchestrator::new(open_session(&source).await);
    let selection = exporter.session().scan(FilterProfile::all()).await.unwrap();
    exporter
        .export_batch(first_root.path(), &selection, &ExportOptions::default(), None)
        .await
        .unwrap();

    let target = empty_target();
    let roundtrip = BatchOrchestrator::new(open_session(&target).await);
    roundtrip
        .import_batch(first_root.path(), &selection, &ImportOptions::default(), None)
        .await
        .unwrap();
    let second_root = TestRoot::new();
    roundtrip
        .export_batch(second_root.path(), &selection, &ExportOptions::default(), None)
        .await
        .unwrap();

    assert_eq!(first_root.xml_files(), second_root.xml_files());
    for file in first_root.xml_files() {
        assert_eq!(
            fs::read(first_root.join(&file)).unwrap(),
            fs::read(second_root.join(&file)).unwrap(),
            "{file}"
        );
    }
}

#[tokio::test]
async fn test_manifest_is_human_readable_json() {
    let source = source_project();
    let exporter = BatchOrchestrator::new(open_session(&source).await);
    let root = TestRoot::new();

    exporter
        .export_batch(root.path(), &[alarms()], &ExportOptions::default(), None)
        .await
        .unwrap();

    let manifest: serde_json::Value = serde_json::from_str(&root.read("meta/manifest.json")).unwrap();
    assert_eq!(manifest["environment_version"], "V19");
    let entry = &manifest["entries"][relative_file_path(&alarms())];
    assert!(entry["hash"].as_str().unwrap().starts_with("sha256:"));
    assert!(entry["updated"].is_string());
}
