//! Deterministic ordering: tie-break tiers, build orders, previous build
//! layers, and parallel build waves.

use std::cmp::Reverse;
use std::collections::{BTreeSet, BinaryHeap, HashMap};

use strata_common::LayerId;

use crate::graph::LayerGraph;

/// Tie-break tier used when two layers are otherwise unordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SortTier {
    /// Compiled-only framework layers.
    Framework = 0,
    /// Ordinary layers.
    Ordinary = 1,
    /// Dynamic application layers.
    Dynamic = 2,
}

impl LayerGraph {
    /// The tier a layer sorts into when breaking ties.
    pub fn sort_priority(&self, id: LayerId) -> SortTier {
        let flags = self.get(id).flags;
        if flags.compiled_only {
            SortTier::Framework
        } else if flags.dynamic {
            SortTier::Dynamic
        } else {
            SortTier::Ordinary
        }
    }

    fn sort_key(&self, id: LayerId) -> (SortTier, LayerId) {
        (self.sort_priority(id), id)
    }

    /// Topologically sorts a set of layers so every layer follows the layers
    /// it extends; among ready layers the lowest `(tier, position)` goes first.
    pub fn linearize(&self, set: &[LayerId]) -> Vec<LayerId> {
        let members: BTreeSet<LayerId> = set.iter().copied().collect();
        let mut pending: HashMap<LayerId, usize> = members
            .iter()
            .map(|&l| {
                let deps = members
                    .iter()
                    .filter(|&&b| self.extends_layer(l, b))
                    .count();
                (l, deps)
            })
            .collect();

        let mut ready: BinaryHeap<Reverse<(SortTier, LayerId)>> = pending
            .iter()
            .filter(|(_, &deps)| deps == 0)
            .map(|(&l, _)| Reverse(self.sort_key(l)))
            .collect();

        let mut order = Vec::with_capacity(members.len());
        while let Some(Reverse((_, next))) = ready.pop() {
            order.push(next);
            for &l in &members {
                if l == next || !self.extends_layer(l, next) {
                    continue;
                }
                if let Some(deps) = pending.get_mut(&l) {
                    *deps -= 1;
                    if *deps == 0 {
                        ready.push(Reverse(self.sort_key(l)));
                    }
                }
            }
        }
        order
    }

    /// The layers whose sources feed `target`'s build, in dependency order.
    ///
    /// This is the target plus every layer it transitively extends. For the
    /// aggregate layer it also includes every other active layer positioned
    /// before it.
    pub fn build_order(&self, target: LayerId) -> Vec<LayerId> {
        let mut set = self.extended_layers(target);
        if self.aggregate_layer() == Some(target) {
            set = self
                .active_layers()
                .into_iter()
                .filter(|&l| l < target)
                .collect();
        }
        set.push(target);
        self.linearize(&set)
    }

    /// Build layers other than `id` that appear in `id`'s build order.
    pub fn build_dependencies(&self, id: LayerId) -> Vec<LayerId> {
        self.build_order(id)
            .into_iter()
            .filter(|&l| l != id && self.is_build_layer(l))
            .collect()
    }

    /// The highest-positioned build layer before `id` within its build order.
    pub fn previous_build_layer(&self, id: LayerId) -> Option<LayerId> {
        self.build_dependencies(id).into_iter().filter(|&l| l < id).max()
    }

    /// The nearest build layer at or after `id` whose build order contains it.
    pub fn covering_build_layer(&self, id: LayerId) -> Option<LayerId> {
        self.build_layers()
            .into_iter()
            .filter(|&b| b >= id)
            .find(|&b| b == id || self.build_order(b).contains(&id))
    }

    /// Groups active build layers into waves that may run concurrently.
    ///
    /// A build layer lands in the wave after the latest wave of any build
    /// layer in its build order, so layers within a wave never depend on
    /// each other.
    pub fn build_waves(&self) -> Vec<Vec<LayerId>> {
        let mut level: HashMap<LayerId, usize> = HashMap::new();
        let mut waves: Vec<Vec<LayerId>> = Vec::new();
        // Dependencies always sit at lower positions.
        for id in self.build_layers() {
            let wave = self
                .build_dependencies(id)
                .iter()
                .filter_map(|dep| level.get(dep))
                .map(|&l| l + 1)
                .max()
                .unwrap_or(0);
            level.insert(id, wave);
            if waves.len() <= wave {
                waves.resize_with(wave + 1, Vec::new);
            }
            waves[wave].push(id);
        }
        for wave in &mut waves {
            wave.sort_by_key(|&l| self.sort_key(l));
        }
        waves
    }
}
