use std::io::Write;
use std::process::ExitCode;
use std::sync::Arc;

use collection_rs::easy_installer::InstallSummary;
use collection_rs::installation::download::{HttpTransfer, NexusCatalog};
use collection_rs::installation::extract::ArchiveExtractor;
use collection_rs::installation::materialize::StandardMaterializer;
use collection_rs::installation::pipeline::{AlwaysContinue, Collaborators, ContinuePolicy, TaskFailure};
use collection_rs::ordering::component_position::{CommandSorter, ComponentSorter, ManifestOrderSorter};

fn main() -> ExitCode {
	let mut opts;

	/* Parse console input */
	let parsed_options = {
		let args: Vec<String> = std::env::args().collect();

		opts = getopts::Options::new();
		opts.optflag( "h", "help",    "Show help");
		opts.optflag( "v", "verbose", "Increased verbosity");
		opts.optflag( "y", "yes",     "Continue without asking when downloads fail");
		opts.optopt(  "j", "threads", "Download worker threads", "N");
		opts.optopt(  "",  "api-key", "API key for the remote catalog", "KEY");
		opts.optopt(  "",  "sorter",  "Command that sorts components", "CMD");
		opts.optopt(  "",  "profile", "Profile the lists are written to", "NAME");
		opts.parsing_style(getopts::ParsingStyle::FloatingFrees);

		let parsed_options = match opts.parse(&args[1..]) {
			Ok(m)  => { m }
			Err(e) => { eprintln!("Unable to parse options: {}", e); return ExitCode::FAILURE }
		};

		if parsed_options.opt_present("h") {
			eprintln!("{}", opts.usage("Usage: collection-rs-terminal [options] <collection.json> <host_dir>"));
			return ExitCode::SUCCESS;
		}

		parsed_options
	};

	let default_filter = if parsed_options.opt_present("v") { "debug" } else { "info" };
	env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter)).init();

	let mut config = collection_rs::Config::load_from_disk().unwrap_or_else(|e| {
		log::warn!("Failed to read config file: {}", e);
		log::warn!("Using default config.");
		collection_rs::Config::default()
	});

	if let Err(e) = apply_overrides(&mut config, &parsed_options) {
		log::error!("{}", e);
		return ExitCode::FAILURE;
	}

	let (manifest_path, host_dir) = match (parsed_options.free.get(0), parsed_options.free.get(1)) {
		(Some(m), Some(h)) => (m, h),
		_ => {
			log::error!("Collection manifest and host directory are required.");
			eprintln!("{}", opts.short_usage("collection-rs-terminal"));
			return ExitCode::FAILURE;
		},
	};

	match install(&config, manifest_path, host_dir, parsed_options.opt_present("y")) {
		Ok(summary) => {
			print_summary(&summary);
			if summary.succeeded() { ExitCode::SUCCESS } else { ExitCode::FAILURE }
		},
		Err(e) => {
			log::error!("Failed to install collection due to error: {}", e);
			ExitCode::FAILURE
		},
	}
}

fn apply_overrides(config: &mut collection_rs::Config, options: &getopts::Matches) -> Result<(), Error> {
	if let Some(threads) = options.opt_str("j") {
		let valid = threads.parse::<usize>().map_or(false, |n| config.set_download_threads(n));
		if !valid {
			return Err(Error::InvalidArgument("threads", threads));
		}
	}
	if let Some(key) = options.opt_str("api-key") {
		config.set_api_key(Some(key));
	}
	if let Some(sorter) = options.opt_str("sorter") {
		config.set_sorter_command(Some(sorter));
	}
	if let Some(profile) = options.opt_str("profile") {
		if !config.set_profile(profile.clone()) {
			return Err(Error::InvalidArgument("profile", profile));
		}
	}
	Ok(())
}

fn install(config: &collection_rs::Config, manifest_path: &str, host_dir: &str, assume_yes: bool) -> Result<InstallSummary, Error> {
	let manifest = collection_rs::Manifest::load(manifest_path)?;
	let mut instance = collection_rs::HostInstance::new(host_dir, config.profile())?;

	if config.api_key().is_none() {
		log::warn!("No API key set, only direct downloads will work.");
	}

	let collaborators = Collaborators {
		transfer: Arc::new(HttpTransfer::new(config)?),
		catalog: Some(Arc::new(NexusCatalog::new(config, manifest.info.domain.clone())?)),
		extractor: Arc::new(ArchiveExtractor::new(config.sevenzip_command())),
		materializer: Arc::new(StandardMaterializer),
	};

	let sorter: Box<dyn ComponentSorter> = match config.sorter_command().and_then(CommandSorter::from_command_line) {
		Some(s) => Box::new(s),
		None => {
			log::info!("No component sorter configured, keeping manifest order.");
			Box::new(ManifestOrderSorter)
		},
	};

	let policy: Box<dyn ContinuePolicy> = if assume_yes { Box::new(AlwaysContinue) } else { Box::new(PromptContinue) };

	let summary = collection_rs::easy_installer::install_collection(config, &mut instance, manifest, collaborators, sorter.as_ref(), policy.as_ref())?;
	Ok(summary)
}

/// Asks on the console.
struct PromptContinue;

impl ContinuePolicy for PromptContinue {
	fn proceed(&self, failures: &[TaskFailure]) -> bool {
		println!("Some packages failed to download:");
		for failure in failures {
			println!("\t{} ({} attempts): {}", failure.package_name, failure.attempts, failure.reason);
		}

		let stdin = std::io::stdin();
		print!("Continue with the remaining packages? [(y)/n] ");
		let _ = std::io::stdout().flush();
		loop {
			let mut input = String::new();
			if stdin.read_line(&mut input).map_or(true, |n| n == 0) {
				/* No console to ask */
				return false;
			}
			let input = input.trim().to_lowercase();
			if input == "y" || input.is_empty() {
				return true;
			} else if input == "n" {
				return false;
			} else {
				println!("\nInput invalid.")
			}
		}
	}
}

fn print_summary(summary: &InstallSummary) {
	let report = &summary.pipeline;
	println!("Downloaded: {}", report.downloaded);
	println!("Installed:  {}", report.installed);
	println!("Skipped:    {}", report.skipped.len());
	println!("Failed:     {}", report.failures.len());
	if report.warnings > 0 {
		println!("Warnings:   {}", report.warnings);
	}
	for failure in &report.failures {
		println!("\t{:?} of {} failed: {}", failure.stage, failure.package_name, failure.reason);
	}

	if report.aborted {
		println!("{}", Error::UserCancelled);
		return;
	}

	if summary.rules.unresolved > 0 {
		println!("{} ordering rules referred to packages not in the collection.", summary.rules.unresolved);
	}
	if summary.violations() > 0 {
		println!("{} ordering rules could not be satisfied.", summary.violations());
	}
	if let Some(lists) = &summary.lists {
		println!("Wrote {} and {}", lists.package_list.display(), lists.component_list.display());
	}
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("collection-rs error: {0}")]
	CollectionRs(#[from] collection_rs::Error),
	#[error("Invalid value for {0}: {1}")]
	InvalidArgument(&'static str, String),
	#[error("User cancelled an action")]
	UserCancelled,
}
