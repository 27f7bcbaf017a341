use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};

#[derive(Parser)]
#[command(about, long_about = None)]
pub struct Cli {
	/// Set a custom config file
	#[arg(short, visible_short_alias = 'f', long, value_name = "FILE")]
	pub config: Option<String>,

	/// Set configuration directory (looks for config.toml / config.yaml)
	#[arg(short = 'C', visible_short_alias = 'd', long, value_name = "PATH")]
	pub config_dir: Option<PathBuf>,

	/// Show current version
	#[arg(short = 'v', visible_short_alias = 'V', long, action = ArgAction::SetTrue)]
	pub version: bool,

	#[command(subcommand)]
	pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
	/// Run the SOCKS5-facing client: pools authenticated tunnels and bridges
	/// local SOCKS5 connections onto them
	Client,

	/// Run the tunnel-facing server: accepts QUIC sessions, authenticates
	/// each stream and dials the requested target
	Server,

	/// Write out a default configuration file
	Init {
		/// Specify the configuration file format
		#[arg(short, long, value_enum, default_value = "toml")]
		format: ConfigFormat,

		/// Where to write the file
		#[arg(short, long, default_value = "config.toml")]
		output: PathBuf,
	},
}

#[derive(clap::ValueEnum, Clone, Debug)]
pub enum ConfigFormat {
	Yaml,
	Toml,
}
