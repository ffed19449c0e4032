mod common;

use common::{id, EchoProducer, Fixture};
use strata_build::{BuildOptions, Project};
use strata_common::TypeName;
use strata_diagnostics::{codes, DiagnosticSink, TerminalRenderer};
use strata_layer::{HookError, HookRegistry, Layer, LayerHooks, LayerState};

const DIAMOND: &str = r#"
[project]
name = "demo"
version = "0.1.0"

[build]
source_extensions = ["sc"]

[[layers]]
name = "base"
package = "base"
build_layer = true

[[layers]]
name = "left"
package = "left"
extends = ["base"]
build_layer = true

[[layers]]
name = "right"
package = "right"
extends = ["base"]
build_layer = true

[[layers]]
name = "top"
package = "top"
extends = ["left", "right"]
"#;

fn diamond() -> Fixture {
    let fx = Fixture::new(DIAMOND);
    fx.write("base/Root.sc", "root");
    fx.write("left/L.sc", "l");
    fx.write("right/R.sc", "r");
    fx.write("top/T.sc", "t");
    fx
}

#[test]
fn failed_layer_skips_dependents_only() {
    let fx = diamond();
    let producer = EchoProducer {
        fail_on: Some("left.L".to_string()),
        ..EchoProducer::new()
    };
    let (project, sink) = fx.open();
    let outcome = project.build(&producer, &sink).unwrap();

    let (base, left, right, top) = (
        id(&project, "base"),
        id(&project, "left"),
        id(&project, "right"),
        id(&project, "top"),
    );
    assert_eq!(outcome.failed, vec![left]);
    assert_eq!(outcome.skipped, vec![top]);
    assert!(outcome.report(base).is_some());
    assert!(outcome.report(right).is_some());
    assert!(sink.has_code_for(codes::BUILD_FAILED, "left"));
    assert!(sink.has_code_for(codes::DEPENDENCY_FAILED, "top"));
    let rendered = sink.render(&TerminalRenderer::new(false));
    assert!(rendered.contains("error[E300]"));
    assert!(rendered.contains("warning[W204]: build layer `top` was skipped because `left` failed"));

    // The failed pass never completed, so the next run distrusts it.
    let (project, sink) = fx.open();
    let outcome = project.build(&EchoProducer::new(), &sink).unwrap();
    assert!(outcome.report(left).unwrap().full_rebuild);
    assert!(sink.has_code_for(codes::INTERRUPTED_BUILD, "left"));
    assert!(outcome.failed.is_empty());
}

#[test]
fn sequential_and_parallel_builds_agree() {
    let producer = EchoProducer::new();
    let serial = diamond();
    let (project, sink) = serial.open();
    let options = BuildOptions {
        parallel: false,
        ..BuildOptions::from(&project.config.build)
    };
    let one = project.build_with(&producer, options, &sink).unwrap();

    let parallel = diamond();
    let (project2, sink2) = parallel.open();
    let two = project2.build(&producer, &sink2).unwrap();

    assert_eq!(one.reports, two.reports);
    for (layer, state) in &one.finished {
        let other = &two.finished[layer];
        let a: Vec<_> = state.index.iter().map(|(k, r)| (k.to_string(), r.hash)).collect();
        let b: Vec<_> = other.index.iter().map(|(k, r)| (k.to_string(), r.hash)).collect();
        assert_eq!(a, b);
    }
}

#[test]
fn unreachable_synchronized_type_is_reported() {
    let fx = Fixture::new(
        r#"
[project]
name = "demo"
version = "0.1.0"

[[layers]]
name = "app"
package = "app"
"#,
    );
    fx.write("app/Session.sc", "session");
    fx.write("app/Page.sc", "page");
    let producer = EchoProducer {
        synchronized: vec!["app.Session".to_string()],
        ..EchoProducer::new()
    };
    let (project, sink) = fx.open();
    let app = id(&project, "app");
    let outcome = project.build(&producer, &sink).unwrap();
    let session = TypeName::new("app.Session");
    assert!(outcome.layer(app).unwrap().dynamic.is_dynamic(&session));
    assert!(!sink.has_errors());

    fx.remove("app/Session.sc");
    let (project, sink) = fx.open();
    let outcome = project.build(&producer, &sink).unwrap();
    assert!(sink.has_code_for(codes::UNREACHABLE_SYNC_TYPE, "app"));
    assert!(!outcome.layer(app).unwrap().dynamic.is_dynamic(&session));
    assert!(outcome.failed.is_empty());
}

#[test]
fn compiled_only_layers_never_mark_dynamic_types() {
    let fx = Fixture::new(
        r#"
[project]
name = "demo"
version = "0.1.0"

[[layers]]
name = "fw"
package = "fw"
dynamic = true
compiled_only = true
"#,
    );
    fx.write("fw/Kernel.sc", "kernel");
    let producer = EchoProducer {
        synchronized: vec!["fw.Kernel".to_string()],
        ..EchoProducer::new()
    };
    let (project, sink) = fx.open();
    let fw = id(&project, "fw");
    let outcome = project.build(&producer, &sink).unwrap();
    assert!(outcome.layer(fw).unwrap().dynamic.is_empty());
    assert!(matches!(
        outcome.resolver(&project.graph).resolve(&TypeName::new("fw.Kernel"), fw),
        Some(strata_build::Resolution::Compiled(_))
    ));
}

struct RejectStart;

impl LayerHooks for RejectStart {
    fn start(&self, layer: &Layer) -> Result<(), HookError> {
        Err(HookError(format!("{} is misconfigured", layer.name)))
    }
}

#[test]
fn hook_failure_excludes_layer_and_dependents() {
    let fx = diamond();
    let mut hooks = HookRegistry::new();
    hooks.register("left", RejectStart);
    let sink = DiagnosticSink::new();
    let project = Project::open(fx.root(), &hooks, &sink).unwrap();

    let left = id(&project, "left");
    let top = id(&project, "top");
    assert_eq!(project.graph.get(left).state, LayerState::Removed);
    assert_eq!(project.graph.get(top).state, LayerState::Removed);
    assert!(sink.has_code_for(codes::LIFECYCLE_FAILED, "left"));

    let outcome = project.build(&EchoProducer::new(), &sink).unwrap();
    let right = id(&project, "right");
    // With `top` removed, `right` is the last active layer and aggregates.
    assert_eq!(project.graph.aggregate_layer(), Some(right));
    assert!(outcome.report(right).is_some());
    assert!(outcome.report(left).is_none());
}

#[test]
fn bad_base_reference_excludes_only_that_layer() {
    let fx = Fixture::new(
        r#"
[project]
name = "demo"
version = "0.1.0"

[[layers]]
name = "core"
package = "core"

[[layers]]
name = "plugin"
package = "plugin"
extends = ["missing"]
"#,
    );
    fx.write("core/A.sc", "a");
    let (project, sink) = fx.open();
    assert!(project.graph.find("plugin").is_none());
    assert!(sink.has_code_for(codes::UNKNOWN_BASE_LAYER, "plugin"));

    let outcome = project.build(&EchoProducer::new(), &sink).unwrap();
    assert!(outcome.report(id(&project, "core")).is_some());
}
