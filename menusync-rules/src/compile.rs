//! Ruleset compilation: edge building, write-conflict detection, cycle
//! detection, and a stable topological ordering.

use crate::rule::Rule;
use crate::ruleset::RuleSet;
use menusync_types::meta::MergePolicy;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::Arc;
use thiserror::Error;

/// Compile-time options for a ruleset.
#[derive(Debug, Clone, Default)]
pub struct CompileOptions {
    pub merge_policy: MergePolicy,

    /// When set, `a -> b` edges are synthesized for every pair with
    /// `a.writes ∩ b.reads ≠ ∅`, and the write-conflict check is relaxed
    /// to last-writer-wins for shared writes.
    pub synthesize_data_edges: bool,

    /// The closed set of flag names rules may declare. A rule declaring a
    /// flag outside the manifest fails compilation.
    pub flag_manifest: BTreeSet<String>,
}

impl CompileOptions {
    pub fn with_policy(merge_policy: MergePolicy) -> Self {
        Self {
            merge_policy,
            ..Self::default()
        }
    }

    pub fn flag_manifest<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.flag_manifest
            .extend(names.into_iter().map(Into::into));
        self
    }
}

/// Two rules that share a written key with no ordering path between them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteConflictPair {
    pub left: String,
    pub right: String,
    pub keys: Vec<String>,
}

impl std::fmt::Display for WriteConflictPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {}, {:?})", self.left, self.right, self.keys)
    }
}

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("duplicate rule name `{name}`")]
    DuplicateName { name: String },

    #[error("rule `{rule}` orders against unknown rule `{target}`")]
    UnknownOrderingTarget { rule: String, target: String },

    #[error("rule `{rule}` declares flag `{flag}` outside the batch manifest")]
    UndeclaredFlag { rule: String, flag: String },

    #[error("unordered write conflicts: {}", render_pairs(.pairs))]
    WriteConflicts { pairs: Vec<WriteConflictPair> },

    #[error("rule cycle: {}", .members.join(" -> "))]
    Cycle { members: Vec<String> },

    #[error("cycle during order computation: produced {produced} of {expected} rules")]
    OrderIncomplete { produced: usize, expected: usize },
}

fn render_pairs(pairs: &[WriteConflictPair]) -> String {
    pairs
        .iter()
        .map(WriteConflictPair::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Validates and compiles `rules` into a frozen, topologically ordered
/// execution plan.
pub fn compile(
    rules: Vec<Arc<dyn Rule>>,
    version: impl Into<String>,
    options: CompileOptions,
) -> Result<RuleSet, CompileError> {
    let mut by_name: BTreeMap<String, Arc<dyn Rule>> = BTreeMap::new();
    for rule in rules {
        let name = rule.meta().name.clone();
        if by_name.insert(name.clone(), rule).is_some() {
            return Err(CompileError::DuplicateName { name });
        }
    }

    for (name, rule) in &by_name {
        let meta = rule.meta();
        for target in meta.before.iter().chain(meta.after.iter()) {
            if !by_name.contains_key(target) {
                return Err(CompileError::UnknownOrderingTarget {
                    rule: name.clone(),
                    target: target.clone(),
                });
            }
        }
        for flag in &meta.flags {
            if !options.flag_manifest.contains(flag) {
                return Err(CompileError::UndeclaredFlag {
                    rule: name.clone(),
                    flag: flag.clone(),
                });
            }
        }
    }

    let edges = build_edges(&by_name, options.synthesize_data_edges);

    if options.merge_policy == MergePolicy::ErrorOnConflict && !options.synthesize_data_edges {
        let pairs = unordered_write_conflicts(&by_name, &edges);
        if !pairs.is_empty() {
            return Err(CompileError::WriteConflicts { pairs });
        }
    }

    if let Some(members) = first_cycle(&by_name, &edges) {
        return Err(CompileError::Cycle { members });
    }

    let ordered = kahn_order(&by_name, &edges)?;

    Ok(RuleSet::freeze(
        version.into(),
        options.merge_policy,
        ordered,
        by_name,
        edges,
    ))
}

/// Edge set over rule names: `r -> t` for `t ∈ r.before`, `d -> r` for
/// `d ∈ r.after`, plus optional data-flow edges.
fn build_edges(
    by_name: &BTreeMap<String, Arc<dyn Rule>>,
    synthesize_data_edges: bool,
) -> BTreeMap<String, BTreeSet<String>> {
    let mut edges: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for name in by_name.keys() {
        edges.insert(name.clone(), BTreeSet::new());
    }

    for (name, rule) in by_name {
        let meta = rule.meta();
        for target in &meta.before {
            if let Some(out) = edges.get_mut(name) {
                out.insert(target.clone());
            }
        }
        for dep in &meta.after {
            if let Some(out) = edges.get_mut(dep) {
                out.insert(name.clone());
            }
        }
    }

    if synthesize_data_edges {
        for (a, rule_a) in by_name {
            for (b, rule_b) in by_name {
                if a == b {
                    continue;
                }
                let writes = &rule_a.meta().writes;
                let reads = &rule_b.meta().reads;
                if writes.intersection(reads).next().is_some() {
                    if let Some(out) = edges.get_mut(a) {
                        out.insert(b.clone());
                    }
                }
            }
        }
    }

    edges
}

/// Every unordered pair with overlapping `writes`. A directed path in
/// either direction counts as ordered.
fn unordered_write_conflicts(
    by_name: &BTreeMap<String, Arc<dyn Rule>>,
    edges: &BTreeMap<String, BTreeSet<String>>,
) -> Vec<WriteConflictPair> {
    let names: Vec<&String> = by_name.keys().collect();
    let mut pairs = Vec::new();

    for i in 0..names.len() {
        for j in (i + 1)..names.len() {
            let (a, b) = (names[i], names[j]);
            let overlap: Vec<String> = by_name[a]
                .meta()
                .writes
                .intersection(&by_name[b].meta().writes)
                .cloned()
                .collect();
            if overlap.is_empty() {
                continue;
            }
            if reachable(edges, a, b) || reachable(edges, b, a) {
                continue;
            }
            pairs.push(WriteConflictPair {
                left: a.clone(),
                right: b.clone(),
                keys: overlap,
            });
        }
    }

    pairs
}

fn reachable(edges: &BTreeMap<String, BTreeSet<String>>, from: &str, to: &str) -> bool {
    let mut seen: BTreeSet<&str> = BTreeSet::new();
    let mut queue: VecDeque<&str> = VecDeque::new();
    queue.push_back(from);
    while let Some(node) = queue.pop_front() {
        if !seen.insert(node) {
            continue;
        }
        if let Some(out) = edges.get(node) {
            for next in out {
                if next.as_str() == to {
                    return true;
                }
                queue.push_back(next.as_str());
            }
        }
    }
    false
}

/// Tarjan over `(names, edges)`; the first component larger than one, in
/// deterministic member order.
fn first_cycle(
    by_name: &BTreeMap<String, Arc<dyn Rule>>,
    edges: &BTreeMap<String, BTreeSet<String>>,
) -> Option<Vec<String>> {
    let mut state = TarjanState {
        edges,
        index: 0,
        indices: BTreeMap::new(),
        low: BTreeMap::new(),
        stack: Vec::new(),
        on_stack: BTreeSet::new(),
        cycles: Vec::new(),
    };

    for name in by_name.keys() {
        if !state.indices.contains_key(name) {
            state.connect(name);
        }
    }

    state.cycles.sort();
    state.cycles.into_iter().next()
}

struct TarjanState<'a> {
    edges: &'a BTreeMap<String, BTreeSet<String>>,
    index: usize,
    indices: BTreeMap<String, usize>,
    low: BTreeMap<String, usize>,
    stack: Vec<String>,
    on_stack: BTreeSet<String>,
    cycles: Vec<Vec<String>>,
}

impl TarjanState<'_> {
    fn connect(&mut self, node: &str) {
        self.indices.insert(node.to_string(), self.index);
        self.low.insert(node.to_string(), self.index);
        self.index += 1;
        self.stack.push(node.to_string());
        self.on_stack.insert(node.to_string());

        let successors: Vec<String> = self
            .edges
            .get(node)
            .map(|out| out.iter().cloned().collect())
            .unwrap_or_default();

        for next in successors {
            if !self.indices.contains_key(&next) {
                self.connect(&next);
                let next_low = self.low[&next];
                if let Some(l) = self.low.get_mut(node) {
                    if next_low < *l {
                        *l = next_low;
                    }
                }
            } else if self.on_stack.contains(&next) {
                let next_index = self.indices[&next];
                if let Some(l) = self.low.get_mut(node) {
                    if next_index < *l {
                        *l = next_index;
                    }
                }
            }
        }

        if self.low[node] == self.indices[node] {
            let mut component = Vec::new();
            while let Some(top) = self.stack.pop() {
                self.on_stack.remove(&top);
                let done = top == node;
                component.push(top);
                if done {
                    break;
                }
            }
            if component.len() > 1 {
                component.sort();
                self.cycles.push(component);
            }
        }
    }
}

/// Kahn's algorithm with a deterministic ready-queue tie-breaker: among
/// ready nodes, pop the minimum `(priority, name)` pair.
fn kahn_order(
    by_name: &BTreeMap<String, Arc<dyn Rule>>,
    edges: &BTreeMap<String, BTreeSet<String>>,
) -> Result<Vec<String>, CompileError> {
    let mut in_degree: BTreeMap<&String, usize> = by_name.keys().map(|n| (n, 0)).collect();
    for out in edges.values() {
        for target in out {
            if let Some(d) = in_degree.get_mut(target) {
                *d += 1;
            }
        }
    }

    let mut ready: BTreeSet<(i32, String)> = in_degree
        .iter()
        .filter(|(_, d)| **d == 0)
        .map(|(name, _)| (by_name[*name].meta().priority, (*name).clone()))
        .collect();

    let mut ordered = Vec::with_capacity(by_name.len());
    while let Some(head) = ready.iter().next().cloned() {
        ready.remove(&head);
        let (_, name) = head;

        if let Some(out) = edges.get(&name) {
            for target in out {
                if let Some(d) = in_degree.get_mut(target) {
                    *d -= 1;
                    if *d == 0 {
                        ready.insert((by_name[target].meta().priority, target.clone()));
                    }
                }
            }
        }
        ordered.push(name);
    }

    if ordered.len() != by_name.len() {
        return Err(CompileError::OrderIncomplete {
            produced: ordered.len(),
            expected: by_name.len(),
        });
    }
    Ok(ordered)
}
