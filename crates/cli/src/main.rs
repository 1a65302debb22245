mod cmd;
mod output;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use cmd::Project;
use output::print_error;

/// Build native code with GNU Autotools
#[derive(Parser)]
#[command(name = "autotools")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Project directory holding the native sources and autotools.toml
  #[arg(short = 'C', long, global = true, default_value = ".")]
  project_dir: PathBuf,

  /// Configuration file (default: <project-dir>/autotools.toml)
  #[arg(short, long, global = true)]
  config: Option<PathBuf>,

  /// Show tool output and every command run
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Stage, configure, build, and install the native sources
  Compile,

  /// Run `make check` in the working directory
  Check,

  /// Remove the symlinks staged in the build directory
  Clean,

  /// Show the detected platform and resolved directories
  Info {
    /// Print as JSON
    #[arg(long)]
    json: bool,
  },
}

fn main() {
  let cli = Cli::parse();
  init_tracing(cli.verbose);

  let result = Project::load(&cli.project_dir, cli.config.as_deref(), cli.verbose).and_then(|project| {
    match cli.command {
      Commands::Compile => cmd::cmd_compile(&project),
      Commands::Check => cmd::cmd_check(&project),
      Commands::Clean => cmd::cmd_clean(&project),
      Commands::Info { json } => cmd::cmd_info(&project, json),
    }
  });

  if let Err(err) = result {
    print_error(&format!("{err:#}"));
    std::process::exit(1);
  }
}

fn init_tracing(verbose: bool) {
  let default_level = if verbose { "debug" } else { "info" };
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .without_time()
    .with_target(false)
    .init();
}
