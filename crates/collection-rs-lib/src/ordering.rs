//! Priority order of the installed packages.
//!
//! Rules from the manifest become a [`ConstraintGraph`], several [`Ranker`]s order the packages
//! independently and a [`Resolver`] fuses their output into an order that keeps every rule not
//! caught in a cycle. Higher priority wins file conflicts.

pub mod constraint_graph;
pub use constraint_graph::ConstraintGraph;
pub mod ranker;
pub use ranker::{RankContext, Ranker, Ranking};
pub mod fusion;
pub use fusion::{Resolver, ResolvedOrder, WeightedFusion, Weights};
pub mod component_position;
pub use component_position::PositionResolver;
