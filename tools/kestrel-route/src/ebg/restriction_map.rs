//! Turn restrictions indexed by their approach `(from, via)`

use kestrel_common::NodeId;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{info, warn};

use crate::formats::TurnRestriction;

#[derive(Debug, Clone, Default)]
struct Approach {
    only_to: Option<NodeId>,
    prohibited: Vec<NodeId>,
}

#[derive(Debug, Clone, Default)]
pub struct RestrictionMap {
    approaches: FxHashMap<(NodeId, NodeId), Approach>,
    involved: FxHashSet<NodeId>,
    ignored: usize,
}

impl RestrictionMap {
    pub fn new(restrictions: &[TurnRestriction]) -> Self {
        let mut map = Self::default();
        for r in restrictions {
            if r.is_ignored() {
                map.ignored += 1;
                continue;
            }
            let approach = map.approaches.entry((r.from, r.via)).or_default();
            if r.is_only {
                match approach.only_to {
                    Some(existing) if existing != r.to => {
                        warn!(
                            from = r.from,
                            via = r.via,
                            kept = existing,
                            dropped = r.to,
                            "conflicting mandatory turns on one approach"
                        );
                        continue;
                    }
                    _ => approach.only_to = Some(r.to),
                }
            } else if !approach.prohibited.contains(&r.to) {
                approach.prohibited.push(r.to);
            }
            map.involved.extend([r.from, r.via, r.to]);
        }
        if map.ignored > 0 {
            warn!(count = map.ignored, "ignoring voided turn restrictions");
        }
        info!(
            approaches = map.approaches.len(),
            ignored = map.ignored,
            "restriction map ready"
        );
        map
    }

    /// The mandatory exit for the approach `from -> via`, if any
    #[cfg(test)]
    fn only_turn(&self, from: NodeId, via: NodeId) -> Option<NodeId> {
        self.approaches.get(&(from, via)).and_then(|a| a.only_to)
    }

    pub fn is_turn_allowed(&self, from: NodeId, via: NodeId, to: NodeId) -> bool {
        match self.approaches.get(&(from, via)) {
            None => true,
            Some(approach) => {
                if let Some(only) = approach.only_to {
                    if only != to {
                        return false;
                    }
                }
                !approach.prohibited.contains(&to)
            }
        }
    }

    /// Node appears as from, via or to of some active restriction
    pub fn is_involved(&self, node: NodeId) -> bool {
        self.involved.contains(&node)
    }

    #[cfg(test)]
    fn number_of_ignored(&self) -> usize {
        self.ignored
    }

    #[cfg(test)]
    fn is_empty(&self) -> bool {
        self.approaches.is_empty()
    }
}
