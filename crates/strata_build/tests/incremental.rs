mod common;

use common::{id, EchoProducer, Fixture};
use strata_build::BuildOptions;
use strata_cache::{BuildMarker, BuildLayout, RecordState};
use strata_diagnostics::codes;

const SINGLE: &str = r#"
[project]
name = "demo"
version = "0.1.0"

[build]
source_extensions = ["sc"]

[[layers]]
name = "app"
package = "app"
"#;

#[test]
fn second_build_without_changes_writes_nothing() {
    let fx = Fixture::new(SINGLE);
    fx.write("app/Main.sc", "main");
    fx.write("app/ui/Button.sc", "button");
    let producer = EchoProducer::new();

    let (project, sink) = fx.open();
    let app = id(&project, "app");
    let first = project.build(&producer, &sink).unwrap();
    let report = first.report(app).unwrap();
    assert_eq!(report.written, 2);
    assert_eq!(report.compile_queue.len(), 2);
    assert!(fx.path("build/app/app/ui/Button.bin").exists());
    let hashes: Vec<_> = first.layer(app).unwrap().index.iter().map(|(k, r)| (k.to_string(), r.hash)).collect();

    let (project, sink) = fx.open();
    let second = project.build(&producer, &sink).unwrap();
    let report = second.report(app).unwrap();
    assert_eq!(report.written, 0);
    assert_eq!(report.unchanged, 2);
    assert!(!report.full_rebuild);
    assert!(report.compile_queue.iter().all(|r| !r.changed));
    let again: Vec<_> = second.layer(app).unwrap().index.iter().map(|(k, r)| (k.to_string(), r.hash)).collect();
    assert_eq!(hashes, again);
    assert!(sink.diagnostics().is_empty());
}

#[test]
fn changed_source_rewrites_only_its_file() {
    let fx = Fixture::new(SINGLE);
    fx.write("app/A.sc", "a");
    fx.write("app/B.sc", "b");
    let producer = EchoProducer::new();
    let (project, sink) = fx.open();
    project.build(&producer, &sink).unwrap();

    fx.write("app/B.sc", "b2");
    let (project, sink) = fx.open();
    let outcome = project.build(&producer, &sink).unwrap();
    let report = outcome.report(id(&project, "app")).unwrap();
    assert_eq!(report.written, 1);
    assert_eq!(report.unchanged, 1);
    assert_eq!(std::fs::read_to_string(fx.path("build/app/app/B.bin")).unwrap(), "b2");
}

#[test]
fn stale_outputs_are_swept_unless_edited() {
    let fx = Fixture::new(SINGLE);
    fx.write("app/Keep.sc", "keep");
    fx.write("app/Old.sc", "old");
    fx.write("app/Edited.sc", "edited");
    let producer = EchoProducer::new();
    let (project, sink) = fx.open();
    project.build(&producer, &sink).unwrap();

    fx.remove("app/Old.sc");
    fx.remove("app/Edited.sc");
    fx.write("build/app/app/Edited.bin", "hand-tuned");

    let (project, sink) = fx.open();
    let app = id(&project, "app");
    let outcome = project.build(&producer, &sink).unwrap();
    let report = outcome.report(app).unwrap();
    assert_eq!(report.deleted, vec!["app/Old.bin"]);
    assert_eq!(report.drifted, vec!["app/Edited.bin"]);
    assert!(!fx.path("build/app/app/Old.bin").exists());
    assert_eq!(
        std::fs::read_to_string(fx.path("build/app/app/Edited.bin")).unwrap(),
        "hand-tuned"
    );
    let index = &outcome.layer(app).unwrap().index;
    assert_eq!(index.state("app/Edited.bin"), RecordState::Stale);
    assert_eq!(index.state("app/Keep.bin"), RecordState::InUse);
    assert!(sink.has_code_for(codes::ARTIFACT_DRIFT, "app"));

    // The drifted record survives so the next pass warns again.
    let (project, sink) = fx.open();
    project.build(&producer, &sink).unwrap();
    assert!(sink.has_code_for(codes::ARTIFACT_DRIFT, "app"));
}

#[test]
fn edited_output_of_live_source_is_not_overwritten() {
    let fx = Fixture::new(SINGLE);
    fx.write("app/Main.sc", "v1");
    let producer = EchoProducer::new();
    let (project, sink) = fx.open();
    project.build(&producer, &sink).unwrap();

    fx.write("build/app/app/Main.bin", "patched");
    fx.write("app/Main.sc", "v2");
    let (project, sink) = fx.open();
    let outcome = project.build(&producer, &sink).unwrap();
    let report = outcome.report(id(&project, "app")).unwrap();
    assert_eq!(report.written, 0);
    assert_eq!(report.drifted, vec!["app/Main.bin"]);
    assert_eq!(std::fs::read_to_string(fx.path("build/app/app/Main.bin")).unwrap(), "patched");
    assert!(sink.has_code_for(codes::ARTIFACT_DRIFT, "app"));
}

#[test]
fn interrupted_pass_forces_full_rebuild() {
    let fx = Fixture::new(SINGLE);
    fx.write("app/Main.sc", "main");
    let producer = EchoProducer::new();
    let (project, sink) = fx.open();
    project.build(&producer, &sink).unwrap();

    // Simulate a kill between the two marker writes.
    let layout = BuildLayout::new(fx.path("build/app"));
    BuildMarker::new(layout.marker_path()).write_started().unwrap();

    let (project, sink) = fx.open();
    let outcome = project.build(&producer, &sink).unwrap();
    let report = outcome.report(id(&project, "app")).unwrap();
    assert!(report.full_rebuild);
    assert_eq!(report.written, 1);
    assert!(sink.has_code_for(codes::INTERRUPTED_BUILD, "app"));
    assert!(!BuildMarker::new(layout.marker_path()).check().is_interrupted());
}

fn build_all() -> BuildOptions {
    BuildOptions {
        build_all: true,
        ..BuildOptions::default()
    }
}

#[test]
fn full_rebuild_keeps_edited_output() {
    let fx = Fixture::new(SINGLE);
    fx.write("app/Main.sc", "v1");
    fx.write("app/Other.sc", "other");
    let producer = EchoProducer::new();
    let (project, sink) = fx.open();
    project.build(&producer, &sink).unwrap();

    fx.write("build/app/app/Main.bin", "patched");
    let (project, sink) = fx.open();
    let outcome = project.build_with(&producer, build_all(), &sink).unwrap();
    let report = outcome.report(id(&project, "app")).unwrap();
    assert!(report.full_rebuild);
    assert_eq!(report.written, 1);
    assert_eq!(report.unchanged, 0);
    assert_eq!(report.drifted, vec!["app/Main.bin"]);
    assert_eq!(std::fs::read_to_string(fx.path("build/app/app/Main.bin")).unwrap(), "patched");
    assert!(sink.has_code_for(codes::ARTIFACT_DRIFT, "app"));
}

#[test]
fn full_rebuild_sweeps_outputs_of_removed_sources() {
    let fx = Fixture::new(SINGLE);
    fx.write("app/Main.sc", "main");
    fx.write("app/Old.sc", "old");
    let producer = EchoProducer::new();
    let (project, sink) = fx.open();
    project.build(&producer, &sink).unwrap();

    fx.remove("app/Old.sc");
    let (project, sink) = fx.open();
    let app = id(&project, "app");
    let outcome = project.build_with(&producer, build_all(), &sink).unwrap();
    let report = outcome.report(app).unwrap();
    assert_eq!(report.deleted, vec!["app/Old.bin"]);
    assert!(!fx.path("build/app/app/Old.bin").exists());
    assert_eq!(outcome.layer(app).unwrap().index.state("app/Old.bin"), RecordState::Removed);
    assert!(sink.diagnostics().is_empty());
}

#[test]
fn interrupted_pass_adopts_bytes_it_already_wrote() {
    let fx = Fixture::new(SINGLE);
    fx.write("app/Main.sc", "v1");
    let producer = EchoProducer::new();
    let (project, sink) = fx.open();
    project.build(&producer, &sink).unwrap();

    // The killed pass wrote the new output but never persisted its index.
    fx.write("app/Main.sc", "v2");
    fx.write("build/app/app/Main.bin", "v2");
    let layout = BuildLayout::new(fx.path("build/app"));
    BuildMarker::new(layout.marker_path()).write_started().unwrap();

    let (project, sink) = fx.open();
    let app = id(&project, "app");
    let outcome = project.build(&producer, &sink).unwrap();
    let report = outcome.report(app).unwrap();
    assert!(report.full_rebuild);
    assert!(report.drifted.is_empty());
    assert_eq!(report.unchanged, 1);
    assert!(sink.with_code(codes::ARTIFACT_DRIFT).is_empty());
    let hash = strata_common::ContentHash::from_bytes(b"v2");
    assert!(outcome.layer(app).unwrap().index.is_current("app/Main.bin", &hash));
}

#[test]
fn corrupt_index_is_treated_as_empty() {
    let fx = Fixture::new(SINGLE);
    fx.write("app/Main.sc", "main");
    let producer = EchoProducer::new();
    let (project, sink) = fx.open();
    project.build(&producer, &sink).unwrap();

    fx.write("build/app/.strata/index.bin", "not a snapshot");
    let (project, sink) = fx.open();
    let outcome = project.build(&producer, &sink).unwrap();
    let report = outcome.report(id(&project, "app")).unwrap();
    assert!(report.full_rebuild);
    assert!(sink.has_code_for(codes::INDEX_CORRUPTION, "app"));
    assert!(!sink.has_errors());
}

#[test]
fn generated_outputs_are_never_scanned_as_sources() {
    let fx = Fixture::new(
        r#"
[project]
name = "demo"
version = "0.1.0"

[build]
source_extensions = ["sc", "bin"]

[[layers]]
name = "core"
package = "core"
build_layer = true

[[layers]]
name = "tools"
package = "tools"
build_layer = true
build_dir = "gen/tools"

[[layers]]
name = "root"
package = "app"
path = "."
extends = ["core", "tools"]
"#,
    );
    fx.write("core/Core.sc", "core");
    fx.write("tools/Tool.sc", "tool");
    fx.write("Main.sc", "main");
    fx.write("build/leftover/Old.sc", "old");
    let producer = EchoProducer::new();
    let (project, sink) = fx.open();
    project.build(&producer, &sink).unwrap();
    assert!(fx.path("build/core/core/Core.bin").exists());
    assert!(fx.path("gen/tools/tools/Tool.bin").exists());

    let (project, _sink) = fx.open();
    let root = project.graph.get(id(&project, "root"));
    let rels: Vec<&str> = root.sources().iter().map(|e| e.relative_path.as_str()).collect();
    assert_eq!(rels, vec!["Main.sc", "core/Core.sc", "tools/Tool.sc"]);
}
