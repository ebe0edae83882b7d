use std::path::PathBuf;
use std::sync::Arc;

use agent_core::{telemetry, version};
use clap::Parser;
use trace_agent::config::Config;
use trace_agent::testing::LengthPrefixedJsonDecoder;
use tracing::info;

#[derive(Parser, Debug)]
#[command(about, long_about = None)]
#[command(disable_version_flag = true)]
struct Args {
	/// Use config from a YAML string
	#[arg(short, long, value_name = "config")]
	config: Option<String>,

	/// Use config from file
	#[arg(short, long, value_name = "file")]
	file: Option<PathBuf>,

	/// Print version (as a simple version string)
	#[arg(short = 'V', value_name = "version")]
	version_short: bool,

	/// Print version (as JSON)
	#[arg(long = "version")]
	version_long: bool,
}

fn main() -> anyhow::Result<()> {
	let _log_flush = telemetry::setup_logging();

	let args = Args::parse();
	let Args {
		config,
		file,
		version_short,
		version_long,
	} = args;

	if version_short {
		println!("{}", version::BuildInfo::new().version);
		return Ok(());
	}
	if version_long {
		println!("{}", version::BuildInfo::new());
		return Ok(());
	}

	tokio::runtime::Builder::new_multi_thread()
		.enable_all()
		.build()
		.unwrap()
		.block_on(async move {
			let contents = match (config, file) {
				(Some(_), Some(_)) => anyhow::bail!("only one of --config or --file"),
				(Some(config), None) => config,
				(None, Some(file)) => tokio::fs::read_to_string(&file).await?,
				(None, None) => anyhow::bail!("either --config or --file is required"),
			};
			let config = Config::from_yaml_str(&contents)?;

			info!(version = %version::BuildInfo::new().version, "starting trace-agent");

			// The Frame Decoder (C5) is an external collaborator per spec.md
			// §4.5/§1: no wire-format codegen lives in this binary. The
			// fixture decoder from `trace_agent::testing` stands in for a
			// real span-format implementation until one is wired in; see
			// DESIGN.md.
			let decoder: Arc<dyn trace_agent::decoder::Decoder> = Arc::new(LengthPrefixedJsonDecoder);

			trace_agent::app::run(config, decoder).await
		})
}
