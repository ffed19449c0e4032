//! Namespace overlap between layers and the conflicts it causes.

use strata_common::LayerId;
use strata_diagnostics::{codes, Diagnostic, DiagnosticSink, Location};
use tracing::warn;

use crate::graph::LayerGraph;
use crate::layer::Layer;

/// Returns a relative source path (without extension) that both layers can
/// contribute, or `None` if their namespaces are structurally disjoint.
///
/// Package prefixes are compared as paths. When one prefix is nested inside
/// the other (or either is empty), the directory index of the layer with the
/// longer prefix is re-rooted under the shorter one and base names are
/// intersected per directory.
pub fn structural_overlap(a: &Layer, b: &Layer) -> Option<String> {
    let (pa, pb) = (a.package_path(), b.package_path());
    let ((short, short_pkg), (long, long_pkg)) = if pa.len() <= pb.len() {
        ((a, pa), (b, pb))
    } else {
        ((b, pb), (a, pa))
    };

    let suffix = if short_pkg.is_empty() {
        long_pkg.as_str()
    } else if long_pkg == short_pkg {
        ""
    } else {
        long_pkg.strip_prefix(&short_pkg)?.strip_prefix('/')?
    };

    for (dir, names) in long.dir_index() {
        let aligned = join(suffix, dir);
        let Some(other) = short.dir_index().get(&aligned) else {
            continue;
        };
        if let Some(name) = names.intersection(other).next() {
            return Some(join(&join(&short_pkg, &aligned), name));
        }
    }
    None
}

fn join(a: &str, b: &str) -> String {
    match (a.is_empty(), b.is_empty()) {
        (true, _) => b.to_string(),
        (_, true) => a.to_string(),
        _ => format!("{a}/{b}"),
    }
}

impl LayerGraph {
    /// Returns `true` if either layer declares that it modifies the other.
    pub fn declared_modifies(&self, a: LayerId, b: LayerId) -> bool {
        let (la, lb) = (self.get(a), self.get(b));
        la.declares_modifies(&lb.name) || lb.declares_modifies(&la.name)
    }

    /// Returns `true` if the two layers' namespaces can hold the same
    /// relative source path, or a `modifies` declaration says they do.
    pub fn overlap(&self, a: LayerId, b: LayerId) -> bool {
        self.declared_modifies(a, b) || structural_overlap(self.get(a), self.get(b)).is_some()
    }

    /// Reports every pair of unrelated, non-transparent active layers that
    /// overlap structurally without a `modifies` declaration.
    ///
    /// Each pair gets one `W200` warning and loses cache sharing. Returns the
    /// number of conflicting pairs.
    pub fn detect_conflicts(&mut self, sink: &DiagnosticSink) -> usize {
        self.conflicts.clear();
        let active = self.active_layers();
        for (i, &a) in active.iter().enumerate() {
            for &b in &active[i + 1..] {
                if self.get(a).flags.transparent || self.get(b).flags.transparent {
                    continue;
                }
                if self.extends_layer(b, a) || self.extends_layer(a, b) {
                    continue;
                }
                if self.declared_modifies(a, b) {
                    continue;
                }
                let Some(path) = structural_overlap(self.get(a), self.get(b)) else {
                    continue;
                };
                let (first, second) = (self.name(a).to_string(), self.name(b).to_string());
                warn!(first = %first, second = %second, path = %path, "overlapping layers");
                sink.emit(
                    Diagnostic::warning(
                        codes::OVERLAP_CONFLICT,
                        format!("layers `{first}` and `{second}` both define `{path}`"),
                        Location::layer(second.as_str()),
                    )
                    .with_note("cache sharing between these layers is disabled")
                    .with_help(format!("declare `modifies = [\"{first}\"]` on `{second}`")),
                );
                self.conflicts.insert((a, b));
            }
        }
        self.conflicts.len()
    }

    /// Returns `false` if the two layers were reported as conflicting.
    pub fn cache_sharing_allowed(&self, a: LayerId, b: LayerId) -> bool {
        let key = if a <= b { (a, b) } else { (b, a) };
        !self.conflicts.contains(&key)
    }
}
