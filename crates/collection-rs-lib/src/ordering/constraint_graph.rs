//! Directed graph of ordering rules between packages.
//!
//! Node `i` is the package at position `i` in the manifest. An edge `a -> b` means `a` must end
//! up with lower priority than `b`, so all edges point from low priority to high priority.

use std::collections::HashMap;

use petgraph::prelude::*;

use crate::manifest::{OrderingRule, Package, PackageRef, RuleKind};

#[derive(Debug, Clone, Default)]
pub struct ConstraintGraph {
	pub graph: DiGraph<(), ()>,
	successors: Vec<Vec<usize>>,
	predecessors: Vec<Vec<usize>>,
	/// Counts of how the rules were handled.
	pub stats: RuleStats,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RuleStats {
	/// Rules that produced an edge, or repeated one that already existed.
	pub applied: usize,
	/// Rules with an endpoint that matched no package.
	pub unresolved: usize,
	/// Rules relating a package to itself.
	pub self_references: usize,
	/// Rules of a kind that doesn't affect ordering.
	pub ignored: usize,
}

struct Lookup<'p> {
	by_hash: HashMap<&'p str, usize>,
	by_name: HashMap<&'p str, usize>,
}

impl<'p> Lookup<'p> {
	fn new(packages: &'p [Package]) -> Self {
		let mut by_hash = HashMap::new();
		let mut by_name = HashMap::new();
		for (i, package) in packages.iter().enumerate() {
			if !package.content_hash.is_empty() {
				by_hash.insert(package.content_hash.as_str(), i);
			}
			let key = package.logical_key();
			if !key.is_empty() {
				by_name.insert(key, i);
			}
		}
		Self { by_hash, by_name }
	}

	/// Hash first, logical file name second.
	fn resolve(&self, reference: &PackageRef) -> Option<usize> {
		let by_hash = (!reference.content_hash.is_empty())
			.then(|| self.by_hash.get(reference.content_hash.as_str()))
			.flatten();
		let by_name = || (!reference.logical_filename.is_empty())
			.then(|| self.by_name.get(reference.logical_filename.as_str()))
			.flatten();
		by_hash.or_else(by_name).copied()
	}
}

impl ConstraintGraph {
	/// Builds the graph from the manifest's rules.
	///
	/// Rules that can't be resolved or relate a package to itself are dropped and counted.
	/// `before(a, b)` adds `a -> b`, `after(a, b)` adds `b -> a`.
	pub fn build(packages: &[Package], rules: &[OrderingRule]) -> Self {
		let mut graph = DiGraph::<(), ()>::with_capacity(packages.len(), rules.len());
		for _ in packages {
			graph.add_node(());
		}

		let mut built = ConstraintGraph {
			graph,
			successors: vec![Vec::new(); packages.len()],
			predecessors: vec![Vec::new(); packages.len()],
			stats: RuleStats::default(),
		};

		let lookup = Lookup::new(packages);
		for rule in rules {
			if let RuleKind::Other(kind) = &rule.kind {
				log::trace!("Ignoring rule of kind \"{}\"", kind);
				built.stats.ignored += 1;
				continue;
			}

			let (source, reference) = match (lookup.resolve(&rule.source), lookup.resolve(&rule.reference)) {
				(Some(s), Some(r)) => (s, r),
				_ => {
					log::debug!("Dropping rule with unresolved endpoint: {:?}", rule);
					built.stats.unresolved += 1;
					continue;
				},
			};

			let (low, high) = match rule.kind {
				RuleKind::Before => (source, reference),
				_ => (reference, source),
			};

			if low == high {
				built.stats.self_references += 1;
				continue;
			}

			built.add_edge(low, high);
			built.stats.applied += 1;
		}

		log::info!("Constraint graph: {} packages, {} edges, {} rules dropped as unresolved",
			packages.len(), built.graph.edge_count(), built.stats.unresolved);
		built
	}

	/// Adds `low -> high` unless it is already present.
	pub fn add_edge(&mut self, low: usize, high: usize) {
		let (a, b) = (NodeIndex::new(low), NodeIndex::new(high));
		if self.graph.contains_edge(a, b) {
			return;
		}
		self.graph.add_edge(a, b, ());
		self.successors[low].push(high);
		self.predecessors[high].push(low);
	}

	pub fn len(&self) -> usize {
		self.successors.len()
	}

	pub fn is_empty(&self) -> bool {
		self.successors.is_empty()
	}

	/// Packages that must rank above `i`, in the order their edges were added.
	pub fn successors(&self, i: usize) -> &[usize] {
		&self.successors[i]
	}

	/// Packages that must rank below `i`, in the order their edges were added.
	pub fn predecessors(&self, i: usize) -> &[usize] {
		&self.predecessors[i]
	}

	/// Every edge as `(low, high)`.
	pub fn edges(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
		self.graph.edge_references().map(|e| (e.source().index(), e.target().index()))
	}

	/// Groups of packages whose rules contradict each other.
	pub fn cycles(&self) -> Vec<Vec<usize>> {
		petgraph::algo::tarjan_scc(&self.graph)
			.into_iter()
			.filter(|scc| scc.len() > 1)
			.map(|scc| {
				let mut members = scc.into_iter().map(|n| n.index()).collect::<Vec<_>>();
				members.sort_unstable();
				members
			})
			.collect()
	}
}
