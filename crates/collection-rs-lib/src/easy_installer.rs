//! Easy Installer
//!
//! Runs a whole collection through [`install_collection`]: folder names, download, install,
//! ordering and the output lists.

use std::sync::Arc;

use crate::emitter::{EmittedLists, Emitter};
use crate::installation::pipeline::{Collaborators, ContinuePolicy, Pipeline, PipelineOptions, PipelineReport};
use crate::manifest::{Manifest, Package};
use crate::ordering::component_position::ComponentSorter;
use crate::ordering::constraint_graph::RuleStats;
use crate::ordering::{ConstraintGraph, PositionResolver, RankContext, ResolvedOrder, Resolver};
use crate::HostInstance;

#[derive(Debug, Clone)]
pub struct InstallSummary {
	pub pipeline: PipelineReport,
	pub rules: RuleStats,
	/// `None` when the run was aborted before ordering.
	pub order: Option<ResolvedOrder>,
	/// Package folders as written, highest priority first.
	pub package_list: Vec<String>,
	pub component_list: Vec<String>,
	pub lists: Option<EmittedLists>,
}

impl InstallSummary {
	/// False when any task failed or the run was aborted.
	pub fn succeeded(&self) -> bool {
		self.pipeline.succeeded()
	}

	pub fn violations(&self) -> usize {
		self.order.as_ref().map_or(0, |o| o.violations)
	}
}

/// Installs a collection into a host instance and writes its priority lists.
///
/// The rule graph is built on its own thread while the pipeline runs.
/// Lists are only written once both worker pools have drained, and not at all when the
/// continue policy declined.
///
/// # Parameters
/// - `config` - Thread counts and retry settings.
/// - `instance` - Target host tree, its folder map is updated and saved.
/// - `manifest` - The collection.
/// - `collaborators` - Network, extraction and materialization.
/// - `sorter` - External component order.
/// - `policy` - Asked whether to go on after download failures.
/// # Errors
/// - [`IO`](crate::error::Error::IO) when a worker pool can't start or the lists can't be written.
/// - [`Bincode`](crate::error::Error::Bincode) when the folder map can't be saved.
pub fn install_collection(
	config: &crate::Config,
	instance: &mut HostInstance,
	manifest: Manifest,
	collaborators: Collaborators,
	sorter: &dyn ComponentSorter,
	policy: &dyn ContinuePolicy,
) -> crate::Result<InstallSummary> {
	let Manifest { info, mut packages, rules, components } = manifest;
	log::info!("Installing collection \"{}\" ({})", info.name, info.domain);

	instance.assign_folder_names(&mut packages);
	instance.save_to_disk()?;
	let packages: Arc<[Package]> = packages.into();

	let pipeline = Pipeline::new(PipelineOptions::new(config, instance), collaborators);
	let (report, graph) = std::thread::scope(|scope| {
		let graph = std::thread::Builder::new()
			.name("constraint-graph".to_string())
			.spawn_scoped(scope, || ConstraintGraph::build(&packages, &rules))?;
		let report = pipeline.run(Arc::clone(&packages), policy);
		let graph = graph.join().unwrap_or_else(|e| std::panic::resume_unwind(e));
		Ok::<_, std::io::Error>((report?, graph))
	})?;

	let mut summary = InstallSummary {
		pipeline: report,
		rules: graph.stats,
		order: None,
		package_list: Vec::new(),
		component_list: Vec::new(),
		lists: None,
	};

	if summary.pipeline.aborted {
		log::warn!("Run aborted, priority lists left untouched.");
		return Ok(summary);
	}

	let positions = PositionResolver::new(instance.mods_dir(), config.install_threads());
	let candidates = positions.candidates(&components, &packages);
	let component_order = positions.component_order(sorter, &packages, &candidates);
	let position_map = PositionResolver::position_map(&component_order);
	let package_positions = positions.resolve(&packages, &position_map);

	let folders = packages
		.iter()
		.map(|p| p.folder_name().unwrap_or(&p.name).to_string())
		.collect::<Vec<_>>();
	let ctx = RankContext { graph: &graph, folders: &folders, positions: &package_positions };
	let order = Resolver::default().resolve(&ctx);

	let (present, missing): (Vec<_>, Vec<_>) = order
		.priority_list()
		.into_iter()
		.partition(|&i| instance.package_dir(&folders[i]).is_dir());
	if !missing.is_empty() {
		log::info!("{} packages have no folder and are left out of the package list", missing.len());
	}

	summary.package_list = present.into_iter().map(|i| folders[i].clone()).collect();
	summary.component_list = component_order;
	summary.lists = Some(Emitter::new(instance.profile_dir()).emit(&summary.package_list, &summary.component_list)?);
	summary.order = Some(order);

	Ok(summary)
}
