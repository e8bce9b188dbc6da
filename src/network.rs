//! Node ownership graph
//!
//! Per-node [`NodeState`] lives in an arena parallel to the world's node
//! arena. Entries are created lazily the first time a node is scanned and
//! are never removed; disconnecting a node resets its fields instead.
//!
//! The `target` pointers form a forest rooted at the home node. Every write
//! to `target` goes through [`NetworkGraph::set_target`], which keeps the
//! inverse `sources` sets consistent.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::debug;

use crate::node::{BaseNode, NodeId, NodeState};
use crate::world::World;

/// Ownership state layered over an immutable [`World`]
#[derive(Debug, Clone)]
pub struct NetworkGraph {
    world: Arc<World>,
    states: Vec<Option<NodeState>>,
}

impl NetworkGraph {
    /// A fresh graph where only the home node is owned
    pub fn new(world: Arc<World>) -> Self {
        let mut states = vec![None; world.len()];
        let home = world.home();
        if let Some(slot) = world.index_of(home.id) {
            states[slot] = Some(NodeState {
                is_owned: true,
                is_scanned: true,
                income: *home.node_type.income_range().start(),
                ..Default::default()
            });
        }
        Self { world, states }
    }

    /// The underlying world
    #[inline]
    pub fn world(&self) -> &Arc<World> {
        &self.world
    }

    /// Home node id
    #[inline]
    pub fn home_id(&self) -> NodeId {
        self.world.home_id()
    }

    /// State of a node, `None` if it was never discovered
    #[inline]
    pub fn state(&self, id: NodeId) -> Option<&NodeState> {
        self.world.index_of(id).and_then(|i| self.states[i].as_ref())
    }

    fn state_mut(&mut self, id: NodeId) -> Option<&mut NodeState> {
        let i = self.world.index_of(id)?;
        self.states[i].as_mut()
    }

    /// Base node paired with its state
    pub fn node(&self, id: NodeId) -> Option<(&BaseNode, Option<&NodeState>)> {
        Some((self.world.node(id)?, self.state(id)))
    }

    /// Whether the node is currently owned
    #[inline]
    pub fn is_owned(&self, id: NodeId) -> bool {
        self.state(id).is_some_and(|s| s.is_owned)
    }

    /// Ids of every node with a state entry, in arena order
    pub fn rendered_ids(&self) -> Vec<NodeId> {
        self.iter_states().map(|(node, _)| node.id).collect()
    }

    /// Ids of every owned node, in arena order
    pub fn owned_ids(&self) -> Vec<NodeId> {
        self.iter_states()
            .filter(|(_, s)| s.is_owned)
            .map(|(node, _)| node.id)
            .collect()
    }

    /// Number of owned nodes, home included
    pub fn owned_count(&self) -> usize {
        self.states.iter().flatten().filter(|s| s.is_owned).count()
    }

    /// Every node with a state entry
    pub fn iter_states(&self) -> impl Iterator<Item = (&BaseNode, &NodeState)> + '_ {
        self.world
            .nodes()
            .iter()
            .zip(&self.states)
            .filter_map(|(node, state)| state.as_ref().map(|s| (node, s)))
    }

    /// Create a state entry if the node has none; returns whether it was new
    pub(crate) fn ensure_state(&mut self, id: NodeId) -> bool {
        match self.world.index_of(id) {
            Some(i) if self.states[i].is_none() => {
                self.states[i] = Some(NodeState::default());
                true
            }
            _ => false,
        }
    }

    /// Mutable access for the engine's timer and income updates
    pub(crate) fn update<F: FnOnce(&mut NodeState)>(&mut self, id: NodeId, f: F) {
        if let Some(state) = self.state_mut(id) {
            f(state);
        }
    }

    /// Point `id` at `target`, maintaining the inverse `sources` sets
    ///
    /// Refuses targets that would close a cycle or point the home node
    /// anywhere; returns whether the write happened.
    pub(crate) fn set_target(&mut self, id: NodeId, target: Option<NodeId>) -> bool {
        if let Some(t) = target {
            if id == self.home_id() || t == id || self.state(t).is_none() {
                return false;
            }
            if self.targets(t).iter().any(|&(ancestor, _)| ancestor == id) {
                debug!(node = id, target = t, "refusing target that would close a cycle");
                return false;
            }
        }

        let Some(old) = self.state_mut(id).map(|s| std::mem::replace(&mut s.target, target)) else {
            return false;
        };
        if let Some(old) = old {
            self.update(old, |s| {
                s.sources.remove(&id);
            });
        }
        if let Some(t) = target {
            self.update(t, |s| {
                s.sources.insert(id);
            });
        }
        true
    }

    /// Mark a node scanned by `scanner`; sets its income on first discovery
    pub(crate) fn mark_scanned(&mut self, id: NodeId, scanner: NodeId, income: f64) -> bool {
        if id == self.home_id() || id == scanner || self.state(scanner).is_none() {
            return false;
        }
        let fresh = self.ensure_state(id);
        if !self.set_target(id, Some(scanner)) {
            return false;
        }
        self.update(id, |s| {
            s.is_scanned = true;
            if fresh {
                s.income = income;
            }
        });
        true
    }

    /// Count every active scan and hack down by `step`
    ///
    /// Returns the nodes whose scan and whose hack finished on this call. A
    /// countdown only fires on the call that takes it from positive to zero.
    pub(crate) fn tick_timers(&mut self, step: f64) -> (Vec<NodeId>, Vec<NodeId>) {
        let mut scans = Vec::new();
        let mut hacks = Vec::new();

        for (node, slot) in self.world.nodes().iter().zip(self.states.iter_mut()) {
            let Some(state) = slot else {
                continue;
            };
            if state.scan_duration > 0.0 {
                state.scan_duration -= step;
                if state.scan_duration <= 0.0 {
                    state.scan_duration = 0.0;
                    scans.push(node.id);
                }
            }
            if state.hack_duration > 0.0 {
                state.hack_duration -= step;
                if state.hack_duration <= 0.0 {
                    state.hack_duration = 0.0;
                    hacks.push(node.id);
                }
            }
        }
        (scans, hacks)
    }

    /// Complete a hack: the node becomes owned
    pub(crate) fn complete_hack(&mut self, id: NodeId) {
        self.update(id, |s| {
            s.is_owned = true;
            s.hack_duration = 0.0;
        });
    }

    /// Disconnect a node and everything downstream of it
    ///
    /// Returns the ids that lost ownership, starting with `id`. The home node
    /// is never disconnected.
    pub(crate) fn disconnect_cascade(&mut self, id: NodeId) -> Vec<NodeId> {
        if id == self.home_id() || self.state(id).is_none() {
            return Vec::new();
        }

        let mut affected = vec![id];
        affected.extend(self.sources(id).into_iter().map(|(source, _)| source));

        let mut lost = Vec::new();
        for &node in &affected {
            if self.is_owned(node) {
                lost.push(node);
            }
            self.update(node, |s| {
                s.is_owned = false;
                s.hack_duration = 0.0;
                s.scan_duration = 0.0;
            });
            self.set_target(node, None);
        }
        lost
    }

    /// Every node downstream of `id`, paired with its depth (children are 1)
    ///
    /// Depth-first with an explicit stack and a visited guard.
    pub fn sources(&self, id: NodeId) -> Vec<(NodeId, usize)> {
        let mut found = Vec::new();
        let mut visited = BTreeSet::from([id]);
        let mut stack: Vec<(NodeId, usize)> = vec![(id, 0)];

        while let Some((current, depth)) = stack.pop() {
            let Some(state) = self.state(current) else {
                continue;
            };
            // Reverse so the smallest id is visited first
            for &child in state.sources.iter().rev() {
                if visited.insert(child) {
                    stack.push((child, depth + 1));
                }
            }
            if current != id {
                found.push((current, depth));
            }
        }
        found
    }

    /// Every ancestor of `id` along the `target` chain, nearest first
    pub fn targets(&self, id: NodeId) -> Vec<(NodeId, usize)> {
        let mut found = Vec::new();
        let mut visited = BTreeSet::from([id]);
        let mut current = self.state(id).and_then(|s| s.target);
        let mut depth = 1;

        while let Some(node) = current {
            if !visited.insert(node) {
                debug!(node = id, "target chain loops back on itself");
                break;
            }
            found.push((node, depth));
            current = self.state(node).and_then(|s| s.target);
            depth += 1;
        }
        found
    }

    /// Owned leaves of the ownership tree, furthest from home first
    ///
    /// A node that has only scanned-but-not-owned children is still a leaf.
    /// Ties in distance are broken by id.
    pub fn edge_nodes(&self) -> Vec<NodeId> {
        let home = self.world.home();
        let mut edges: Vec<(NodeId, f64)> = self
            .iter_states()
            .filter(|(_, s)| s.is_owned && !s.sources.iter().any(|&c| self.is_owned(c)))
            .map(|(node, _)| (node.id, node.distance_km(home)))
            .collect();

        edges.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        edges.into_iter().map(|(id, _)| id).collect()
    }

    /// Check the forest invariants
    ///
    /// - `sources(X)` equals `{Y : Y.target == X}`
    /// - every owned node's target chain ends at home without looping
    /// - the home node is owned and has no target
    pub fn is_consistent(&self) -> bool {
        let home = self.home_id();
        match self.state(home) {
            Some(s) if s.is_owned && s.target.is_none() => {}
            _ => return false,
        }

        for (node, state) in self.iter_states() {
            for &child in &state.sources {
                if self.state(child).and_then(|s| s.target) != Some(node.id) {
                    return false;
                }
            }
            if let Some(t) = state.target {
                if !self.state(t).is_some_and(|s| s.sources.contains(&node.id)) {
                    return false;
                }
            }
            if state.is_owned && node.id != home {
                let chain = self.targets(node.id);
                if chain.last().map(|&(root, _)| root) != Some(home) {
                    return false;
                }
                if chain.iter().any(|&(ancestor, _)| !self.is_owned(ancestor)) {
                    return false;
                }
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::tests::line_world;

    fn graph() -> NetworkGraph {
        NetworkGraph::new(Arc::new(line_world(100)))
    }

    /// Scan `id` from `parent` and hack it
    fn own(graph: &mut NetworkGraph, id: NodeId, parent: NodeId) {
        assert!(graph.mark_scanned(id, parent, 1.0));
        graph.complete_hack(id);
    }

    #[test]
    fn test_new_graph_owns_only_home() {
        let graph = graph();
        assert_eq!(graph.owned_ids(), vec![100]);
        assert_eq!(graph.rendered_ids(), vec![100]);
        assert_eq!(graph.edge_nodes(), vec![100]);
        assert!(graph.state(1).is_none());
        assert!(graph.is_consistent());
    }

    #[test]
    fn test_sources_and_targets_with_depth() {
        let mut graph = graph();
        own(&mut graph, 1, 100);
        own(&mut graph, 2, 1);
        own(&mut graph, 3, 2);
        graph.mark_scanned(4, 1, 1.0);

        let mut below_one = graph.sources(1);
        below_one.sort_unstable();
        assert_eq!(below_one, vec![(2, 1), (3, 2), (4, 1)]);
        assert_eq!(graph.targets(3), vec![(2, 1), (1, 2), (100, 3)]);
        assert!(graph.targets(100).is_empty());
        assert!(graph.is_consistent());
    }

    #[test]
    fn test_edge_nodes_furthest_first() {
        let mut graph = graph();
        own(&mut graph, 1, 100);
        own(&mut graph, 5, 100);
        own(&mut graph, 2, 1);
        // Scanned child does not stop node 5 being a leaf
        graph.mark_scanned(6, 5, 1.0);

        assert_eq!(graph.edge_nodes(), vec![5, 2]);
    }

    #[test]
    fn test_disconnect_cascades() {
        let mut graph = graph();
        own(&mut graph, 1, 100);
        own(&mut graph, 2, 1);
        graph.mark_scanned(3, 2, 1.0);

        let lost = graph.disconnect_cascade(1);
        assert_eq!(lost, vec![1, 2]);
        assert_eq!(graph.owned_ids(), vec![100]);
        for id in [1, 2, 3] {
            let state = graph.state(id).unwrap();
            assert!(state.is_scanned);
            assert!(state.target.is_none());
        }
        assert!(graph.state(100).unwrap().sources.is_empty());
        assert!(graph.is_consistent());
    }

    #[test]
    fn test_home_never_disconnects() {
        let mut graph = graph();
        assert!(graph.disconnect_cascade(100).is_empty());
        assert!(graph.is_owned(100));
    }

    #[test]
    fn test_set_target_refuses_cycles() {
        let mut graph = graph();
        own(&mut graph, 1, 100);
        own(&mut graph, 2, 1);
        assert!(!graph.set_target(1, Some(2)));
        assert!(!graph.set_target(100, Some(1)));
        assert!(!graph.set_target(1, Some(1)));
        assert!(graph.is_consistent());
    }

    #[test]
    fn test_retarget_moves_source_entry() {
        let mut graph = graph();
        own(&mut graph, 1, 100);
        graph.mark_scanned(2, 1, 1.0);
        graph.mark_scanned(2, 100, 5.0);

        assert!(!graph.state(1).unwrap().sources.contains(&2));
        assert!(graph.state(100).unwrap().sources.contains(&2));
        // Income is only assigned on first discovery
        assert_eq!(graph.state(2).unwrap().income, 1.0);
        assert!(graph.is_consistent());
    }

    #[test]
    fn test_timers_fire_once() {
        let mut graph = graph();
        graph.mark_scanned(1, 100, 1.0);
        graph.update(1, |s| s.hack_duration = 2.0);
        graph.update(100, |s| s.scan_duration = 1.5);

        assert_eq!(graph.tick_timers(1.0), (vec![], vec![]));
        assert_eq!(graph.tick_timers(1.0), (vec![100], vec![1]));
        assert_eq!(graph.tick_timers(1.0), (vec![], vec![]));
        assert!(!graph.state(1).unwrap().is_hacking());
    }

    #[test]
    fn test_scan_from_undiscovered_is_refused() {
        let mut graph = graph();
        assert!(!graph.mark_scanned(2, 1, 1.0));
    }
}
