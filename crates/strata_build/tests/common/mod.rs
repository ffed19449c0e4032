#![allow(dead_code)]

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use strata_build::{GeneratedFile, Project, SourceContext, SourceOutput, SourceProducer};
use strata_common::LayerId;
use strata_diagnostics::DiagnosticSink;
use strata_layer::{HookRegistry, SourceEntry};

/// A project directory with a `strata.toml`.
pub struct Fixture {
    dir: tempfile::TempDir,
}

impl Fixture {
    pub fn new(config: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("strata.toml"), config).unwrap();
        Self { dir }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn path(&self, rel: &str) -> PathBuf {
        self.root().join(rel)
    }

    pub fn write(&self, rel: &str, content: &str) {
        let path = self.path(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    pub fn remove(&self, rel: &str) {
        std::fs::remove_file(self.path(rel)).unwrap();
    }

    pub fn open(&self) -> (Project, DiagnosticSink) {
        let sink = DiagnosticSink::new();
        let project = Project::open(self.root(), &HookRegistry::new(), &sink).unwrap();
        (project, sink)
    }
}

pub fn id(project: &Project, name: &str) -> LayerId {
    project.graph.find(name).unwrap()
}

/// Generates `<type path>.bin` holding the source bytes, read lazily.
#[derive(Default)]
pub struct EchoProducer {
    pub reads: Arc<AtomicUsize>,
    pub fail_on: Option<String>,
    pub synchronized: Vec<String>,
}

impl EchoProducer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

impl SourceProducer for EchoProducer {
    fn produce(&self, source: &SourceEntry, cx: SourceContext<'_>) -> io::Result<SourceOutput> {
        if self.fail_on.as_deref() == Some(cx.type_name.as_str()) {
            return Err(io::Error::new(io::ErrorKind::Other, "generator crashed"));
        }
        let key = format!("{}.bin", cx.type_name.as_str().replace('.', "/"));
        let path = source.absolute_path.clone();
        let reads = Arc::clone(&self.reads);
        let file = GeneratedFile::lazy(key, move || {
            reads.fetch_add(1, Ordering::SeqCst);
            std::fs::read(path)
        })
        .compiled();
        let mut output = SourceOutput::files(vec![file]);
        if self.synchronized.iter().any(|t| t == cx.type_name.as_str()) {
            output.dynamic = true;
            output.synchronized = true;
        }
        Ok(output)
    }
}
