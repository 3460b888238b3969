//! Combines the rankings into the final order.

use super::constraint_graph::ConstraintGraph;
use super::ranker::{self, RankContext, Ranker, Ranking};

/// Weight of each strategy in the combined score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Weights {
	pub depth_first: f64,
	pub kahn: f64,
	pub external_position: f64,
	pub manifest_order: f64,
}

impl Default for Weights {
	fn default() -> Self {
		Self { depth_first: 2.0, kahn: 2.0, external_position: 1.5, manifest_order: 0.5 }
	}
}

impl Weights {
	pub fn of(&self, ranker: Ranker) -> f64 {
		match ranker {
			Ranker::DepthFirst => self.depth_first,
			Ranker::Kahn => self.kahn,
			Ranker::ExternalPosition => self.external_position,
			Ranker::ManifestOrder => self.manifest_order,
		}
	}
}

/// Turns several rankings into one tie-break key per package, lower keys are placed first.
pub trait Fusion {
	fn fuse(&self, rankings: &[(Ranker, Ranking)], len: usize) -> Vec<usize>;
}

/// Weighted mean of the ranks.
#[derive(Debug, Clone, Copy, Default)]
pub struct WeightedFusion {
	pub weights: Weights,
}

impl Fusion for WeightedFusion {
	fn fuse(&self, rankings: &[(Ranker, Ranking)], len: usize) -> Vec<usize> {
		let total: f64 = rankings.iter().map(|(r, _)| self.weights.of(*r)).sum();
		let scores = (0..len)
			.map(|i| {
				let sum: f64 = rankings.iter().map(|(r, ranking)| self.weights.of(*r) * ranking.rank_of(i) as f64).sum();
				if total > 0.0 { sum / total } else { 0.0 }
			})
			.collect::<Vec<_>>();

		let mut sequence = (0..len).collect::<Vec<_>>();
		/* Stable, equal scores keep manifest order */
		sequence.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));
		Ranking::from_sequence(&sequence).as_slice().to_vec()
	}
}

/// The resolved order and what was wrong with the rules on the way there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedOrder {
	/// Package indices, lowest priority first.
	pub sequence: Vec<usize>,
	/// Edges whose low end still sits above the high end.
	pub violations: usize,
	/// Sets of packages with contradicting rules.
	pub cycles: Vec<Vec<usize>>,
}

impl ResolvedOrder {
	/// Package indices, highest priority first.
	pub fn priority_list(&self) -> Vec<usize> {
		self.sequence.iter().rev().copied().collect()
	}
}

/// Runs the rankers and fuses their output.
#[derive(Debug, Clone)]
pub struct Resolver<F: Fusion = WeightedFusion> {
	pub rankers: Vec<Ranker>,
	pub fusion: F,
}

impl Default for Resolver<WeightedFusion> {
	fn default() -> Self {
		Self { rankers: Ranker::ALL.to_vec(), fusion: WeightedFusion::default() }
	}
}

impl<F: Fusion> Resolver<F> {
	pub fn with_fusion(fusion: F) -> Self {
		Self { rankers: Ranker::ALL.to_vec(), fusion }
	}

	/// Computes the final order.
	///
	/// The fused key is used as the tie-break of a last topological pass, so every rule that
	/// isn't part of a cycle holds in the result.
	pub fn resolve(&self, ctx: &RankContext) -> ResolvedOrder {
		let rankings = self.rankers.iter().map(|r| (*r, r.rank(ctx))).collect::<Vec<_>>();
		for (ranker, ranking) in &rankings {
			log::trace!("{:?} ranking: {:?}", ranker, ranking.as_slice());
		}

		let key = self.fusion.fuse(&rankings, ctx.len());
		let (sequence, _) = ranker::kahn(ctx.graph, &key);

		let violations = count_violations(ctx.graph, &sequence);
		let cycles = ctx.graph.cycles();
		if violations > 0 {
			log::warn!("{} ordering rules could not be satisfied, {} groups of packages have contradicting rules.", violations, cycles.len());
		}

		ResolvedOrder { sequence, violations, cycles }
	}
}

/// Number of edges `low -> high` where `low` is placed after `high`.
pub fn count_violations(graph: &ConstraintGraph, sequence: &[usize]) -> usize {
	let ranking = Ranking::from_sequence(sequence);
	graph.edges().filter(|&(low, high)| ranking.rank_of(low) > ranking.rank_of(high)).count()
}
