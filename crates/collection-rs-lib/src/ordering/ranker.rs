//! Independent orderings of the package set.
//!
//! Each [`Ranker`] turns the same [`RankContext`] into a [`Ranking`], a permutation giving
//! every package its place in that strategy's own output.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use super::constraint_graph::ConstraintGraph;

/// Key for packages that no external position was found for, they sort after everything else.
pub const UNMATCHED: usize = usize::MAX;

/// Inputs shared by every strategy.
#[derive(Debug, Clone, Copy)]
pub struct RankContext<'a> {
	pub graph: &'a ConstraintGraph,
	/// Folder name of each package, used to order sinks.
	pub folders: &'a [String],
	/// Earliest external component position of each package.
	pub positions: &'a [Option<usize>],
}

impl RankContext<'_> {
	pub fn len(&self) -> usize {
		self.graph.len()
	}

	pub fn is_empty(&self) -> bool {
		self.graph.is_empty()
	}

	/// Position of each package with [`UNMATCHED`] standing in for none.
	pub fn position_keys(&self) -> Vec<usize> {
		(0..self.len()).map(|i| self.positions.get(i).copied().flatten().unwrap_or(UNMATCHED)).collect()
	}
}

/// Place of every package in one strategy's output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ranking {
	ranks: Vec<usize>,
	/// Set when the strategy ran into contradicting rules.
	pub cycle_detected: bool,
}

impl Ranking {
	/// Ranks from a sequence of package indices, the first gets rank 0.
	pub fn from_sequence(sequence: &[usize]) -> Self {
		let mut ranks = vec![0; sequence.len()];
		for (rank, &package) in sequence.iter().enumerate() {
			ranks[package] = rank;
		}
		Self { ranks, cycle_detected: false }
	}

	pub fn rank_of(&self, package: usize) -> usize {
		self.ranks[package]
	}

	pub fn as_slice(&self) -> &[usize] {
		&self.ranks
	}

	/// Package indices ordered by rank.
	pub fn sequence(&self) -> Vec<usize> {
		let mut sequence = vec![0; self.ranks.len()];
		for (package, &rank) in self.ranks.iter().enumerate() {
			sequence[rank] = package;
		}
		sequence
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Ranker {
	/// Post-order walk from the sinks, reversed so rank 0 is the highest priority.
	DepthFirst,
	/// Topological order, ties broken by external position. Rank 0 is the lowest priority.
	Kahn,
	/// Earliest external component position, unmatched last.
	ExternalPosition,
	/// Order of the manifest.
	ManifestOrder,
}

impl Ranker {
	pub const ALL: [Ranker; 4] = [Ranker::DepthFirst, Ranker::Kahn, Ranker::ExternalPosition, Ranker::ManifestOrder];

	pub fn rank(&self, ctx: &RankContext) -> Ranking {
		match self {
			Ranker::DepthFirst => depth_first(ctx),
			Ranker::Kahn => {
				let (sequence, cycle_detected) = kahn(ctx.graph, &ctx.position_keys());
				Ranking { cycle_detected, ..Ranking::from_sequence(&sequence) }
			},
			Ranker::ExternalPosition => {
				let keys = ctx.position_keys();
				let mut sequence = (0..ctx.len()).collect::<Vec<_>>();
				sequence.sort_by_key(|&i| keys[i]);
				Ranking::from_sequence(&sequence)
			},
			Ranker::ManifestOrder => Ranking::from_sequence(&(0..ctx.len()).collect::<Vec<_>>()),
		}
	}
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
	Unvisited,
	InProgress,
	Done,
}

fn depth_first(ctx: &RankContext) -> Ranking {
	let graph = ctx.graph;
	let n = graph.len();
	let folder = |i: usize| ctx.folders.get(i).map(String::as_str).unwrap_or_default();

	let mut sinks = (0..n).filter(|&i| graph.successors(i).is_empty()).collect::<Vec<_>>();
	sinks.sort_by(|&a, &b| folder(a).cmp(folder(b)).then(a.cmp(&b)));

	let mut marks = vec![Mark::Unvisited; n];
	let mut sequence = Vec::with_capacity(n);
	let mut cycle_detected = false;

	/* Iterative post-order over predecessors, the frame holds the next predecessor to look at */
	let mut visit = |start: usize, marks: &mut Vec<Mark>, sequence: &mut Vec<usize>| {
		if marks[start] != Mark::Unvisited {
			return;
		}
		marks[start] = Mark::InProgress;
		let mut stack = vec![(start, 0usize)];

		while let Some((node, next)) = stack.last_mut() {
			let node = *node;
			if let Some(&pred) = graph.predecessors(node).get(*next) {
				*next += 1;
				match marks[pred] {
					Mark::Unvisited => {
						marks[pred] = Mark::InProgress;
						stack.push((pred, 0));
					},
					Mark::InProgress => cycle_detected = true,
					Mark::Done => {},
				}
			} else {
				marks[node] = Mark::Done;
				sequence.push(node);
				stack.pop();
			}
		}
	};

	for &sink in &sinks {
		visit(sink, &mut marks, &mut sequence);
	}
	/* Only nodes caught in cycles are left, visited in the same folder order */
	let mut remaining = (0..n).filter(|&i| marks[i] == Mark::Unvisited).collect::<Vec<_>>();
	remaining.sort_by(|&a, &b| folder(a).cmp(folder(b)).then(a.cmp(&b)));
	for i in remaining {
		visit(i, &mut marks, &mut sequence);
	}

	if cycle_detected {
		log::warn!("Depth first ordering found contradicting rules.");
	}

	sequence.reverse();
	Ranking { cycle_detected, ..Ranking::from_sequence(&sequence) }
}

/// Kahn's algorithm with a min-heap on `(key, index)`.
///
/// Packages left over by a cycle are appended in key order.
///
/// # Returns
/// The sequence, lowest priority first, and whether a cycle was left over.
pub fn kahn(graph: &ConstraintGraph, keys: &[usize]) -> (Vec<usize>, bool) {
	let n = graph.len();
	let mut in_degree = (0..n).map(|i| graph.predecessors(i).len()).collect::<Vec<_>>();
	let mut ready = (0..n)
		.filter(|&i| in_degree[i] == 0)
		.map(|i| Reverse((keys[i], i)))
		.collect::<BinaryHeap<_>>();

	let mut sequence = Vec::with_capacity(n);
	let mut placed = vec![false; n];

	while let Some(Reverse((_, node))) = ready.pop() {
		sequence.push(node);
		placed[node] = true;
		for &succ in graph.successors(node) {
			in_degree[succ] -= 1;
			if in_degree[succ] == 0 {
				ready.push(Reverse((keys[succ], succ)));
			}
		}
	}

	let cycle_detected = sequence.len() < n;
	if cycle_detected {
		let mut rest = (0..n).filter(|&i| !placed[i]).collect::<Vec<_>>();
		rest.sort_by_key(|&i| (keys[i], i));
		log::debug!("{} packages are part of or behind a rule cycle", rest.len());
		sequence.extend(rest);
	}

	(sequence, cycle_detected)
}
