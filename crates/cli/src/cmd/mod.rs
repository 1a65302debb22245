mod check;
mod clean;
mod compile;
mod info;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

use autotools_lib::build::BuildConfig;
use autotools_lib::config::Config;
use autotools_lib::consts::CONFIG_FILE;
use autotools_lib::platform::Environment;

pub use check::cmd_check;
pub use clean::cmd_clean;
pub use compile::cmd_compile;
pub use info::cmd_info;

/// A project directory with its configuration resolved.
pub struct Project {
  pub dir: PathBuf,
  pub config_file: PathBuf,
  pub build: BuildConfig,
  pub environment: Environment,
}

impl Project {
  pub fn load(project_dir: &Path, config_file: Option<&Path>, verbose: bool) -> Result<Self> {
    let dir = dunce::canonicalize(project_dir)
      .with_context(|| format!("Project directory not found: {}", project_dir.display()))?;
    let config_file = match config_file {
      Some(path) => path.to_path_buf(),
      None => dir.join(CONFIG_FILE),
    };

    debug!(project = %dir.display(), config = %config_file.display(), "loading project");
    let mut config = Config::load(&config_file)?;
    config.verbose |= verbose;

    Ok(Self {
      build: config.resolve(&dir),
      environment: config.environment(),
      dir,
      config_file,
    })
  }

  pub fn runtime(&self) -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new().context("Failed to create async runtime")
  }
}
