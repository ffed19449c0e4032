//! The contract between a build pass and the code generators it drives.
//!
//! The pass never looks inside generated bytes. It reads each descriptor's
//! key, hashes the content, and decides whether to write, skip, or inherit.

use std::fmt;
use std::io;

use strata_common::TypeName;
use strata_layer::{Layer, SourceEntry};

/// Bytes of a generated file, either ready or produced on demand.
pub enum FileContent {
    /// Bytes already in memory.
    Bytes(Vec<u8>),
    /// A producer invoked only if the pass actually needs the bytes.
    Lazy(Box<dyn FnOnce() -> io::Result<Vec<u8>> + Send>),
}

impl FileContent {
    /// Returns the bytes, running a lazy producer if needed.
    pub fn produce(self) -> io::Result<Vec<u8>> {
        match self {
            FileContent::Bytes(bytes) => Ok(bytes),
            FileContent::Lazy(produce) => produce(),
        }
    }
}

impl fmt::Debug for FileContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileContent::Bytes(bytes) => write!(f, "Bytes({} bytes)", bytes.len()),
            FileContent::Lazy(_) => f.write_str("Lazy"),
        }
    }
}

/// One file generated from a source.
#[derive(Debug)]
pub struct GeneratedFile {
    /// `/`-separated output path relative to the build directory. This is
    /// the file's key in the artifact index.
    pub relative_path: String,
    /// The file's bytes.
    pub content: FileContent,
    /// Whether the file must go through a compile step.
    pub needs_compile: bool,
    /// Keys of other generated files that stay alive while this one does.
    pub dependent_files: Vec<String>,
}

impl GeneratedFile {
    /// A file with bytes already in memory.
    pub fn new(relative_path: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            relative_path: relative_path.into(),
            content: FileContent::Bytes(bytes.into()),
            needs_compile: false,
            dependent_files: Vec::new(),
        }
    }

    /// A file whose bytes are produced only when they are needed.
    pub fn lazy(
        relative_path: impl Into<String>,
        produce: impl FnOnce() -> io::Result<Vec<u8>> + Send + 'static,
    ) -> Self {
        Self {
            relative_path: relative_path.into(),
            content: FileContent::Lazy(Box::new(produce)),
            needs_compile: false,
            dependent_files: Vec::new(),
        }
    }

    /// Marks the file as needing compilation.
    pub fn compiled(mut self) -> Self {
        self.needs_compile = true;
        self
    }

    /// Adds a dependent file key.
    pub fn with_dependent(mut self, key: impl Into<String>) -> Self {
        self.dependent_files.push(key.into());
        self
    }

    /// The extension of the output path, or `""`.
    pub fn extension(&self) -> &str {
        let name = self
            .relative_path
            .rsplit_once('/')
            .map_or(self.relative_path.as_str(), |(_, name)| name);
        name.rsplit_once('.').map_or("", |(_, ext)| ext)
    }
}

/// Everything a producer returns for one source.
#[derive(Debug, Default)]
pub struct SourceOutput {
    /// Generated files, in the order the producer emits them.
    pub files: Vec<GeneratedFile>,
    /// The type should be treated as dynamic even if its layer is not.
    pub dynamic: bool,
    /// The type takes part in cross-process synchronization.
    pub synchronized: bool,
}

impl SourceOutput {
    /// Output consisting of the given files.
    pub fn files(files: Vec<GeneratedFile>) -> Self {
        Self {
            files,
            ..Self::default()
        }
    }
}

/// What a producer knows about the source it is asked about.
#[derive(Debug, Clone, Copy)]
pub struct SourceContext<'a> {
    /// The layer that owns the source.
    pub owner: &'a Layer,
    /// The build layer whose pass is running.
    pub build_layer: &'a Layer,
    /// The type the source defines.
    pub type_name: &'a TypeName,
}

/// Turns sources into generated files.
///
/// Implementations are shared across concurrently running passes.
pub trait SourceProducer: Send + Sync {
    /// Describes the files generated from `source`.
    fn produce(&self, source: &SourceEntry, cx: SourceContext<'_>) -> io::Result<SourceOutput>;
}
