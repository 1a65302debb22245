//! Project configuration (`autotools.toml`).
//!
//! Every key is optional. Relative paths are taken relative to the project
//! directory, and [`Config::resolve`] turns the file into the absolute
//! [`BuildConfig`] the build goals work from.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::build::{BuildConfig, Layout};
use crate::consts::AUTOTOOLS_DIR;
use crate::platform::{Environment, arch, os};

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("failed to read {}: {source}", .path.display())]
  Read {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to parse {}: {source}", .path.display())]
  Parse {
    path: PathBuf,
    #[source]
    source: toml::de::Error,
  },
}

/// The contents of `autotools.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
  /// Native sources, default `src/main/native`.
  pub native_dir: Option<PathBuf>,
  /// Autotools scripts (`configure.ac`, `Makefile.am`, ...), default `src/main/autotools`.
  pub autotools_dir: Option<PathBuf>,
  /// Build output root, default `target`.
  pub build_dir: Option<PathBuf>,
  pub configure_dir: Option<PathBuf>,
  pub work_dir: Option<PathBuf>,
  pub install_dir: Option<PathBuf>,
  pub dependencies_dir: Option<PathBuf>,
  pub verbose: bool,
  /// Use `autoreconf` instead of the aclocal/automake chain, default `true`.
  pub autoreconf: Option<bool>,
  pub layout: Layout,
  pub configure_args: Vec<String>,
  pub configure_env: BTreeMap<String, String>,
  pub make_args: Vec<String>,
  pub make_env: BTreeMap<String, String>,
  /// Macro directory name below the configure directory, default `m4`.
  pub macro_directory: Option<String>,
  /// Zip or jar files holding `<MACRO>.m4` entries.
  pub macro_archives: Vec<PathBuf>,
  /// Default `<autotools_dir>/postinstall.sh`.
  pub post_install_script: Option<PathBuf>,
  pub pkg_config_path: Option<String>,
  /// Replace regular files in the staging directories with links.
  pub force_staging: bool,
  /// Kill child processes running longer than this.
  pub timeout_secs: Option<u64>,
  pub environment: EnvironmentConfig,
}

/// The `[environment]` table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EnvironmentConfig {
  pub os: Option<String>,
  pub arch: Option<String>,
  /// Cross-compilation host triple passed as `--host`.
  pub host: Option<String>,
  pub platform_mapping: BTreeMap<String, String>,
}

impl Config {
  /// Load `path`, treating a missing file as an empty configuration.
  pub fn load(path: &Path) -> Result<Self, ConfigError> {
    let text = match std::fs::read_to_string(path) {
      Ok(text) => text,
      Err(e) if e.kind() == io::ErrorKind::NotFound => {
        debug!(path = %path.display(), "no configuration file, using defaults");
        return Ok(Self::default());
      }
      Err(source) => {
        return Err(ConfigError::Read {
          path: path.to_path_buf(),
          source,
        });
      }
    };
    Self::from_toml_str(&text).map_err(|source| ConfigError::Parse {
      path: path.to_path_buf(),
      source,
    })
  }

  pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
    toml::from_str(text)
  }

  /// Resolve against `project_dir`, which should be absolute.
  pub fn resolve(&self, project_dir: &Path) -> BuildConfig {
    let at = |path: &Option<PathBuf>, default: PathBuf| match path {
      Some(path) => project_dir.join(path),
      None => default,
    };

    let build_dir = at(&self.build_dir, project_dir.join("target"));
    let autotools_build_dir = build_dir.join(AUTOTOOLS_DIR);
    let autotools_dir = at(&self.autotools_dir, project_dir.join("src/main/autotools"));
    let post_install_script = Some(at(&self.post_install_script, autotools_dir.join("postinstall.sh")));

    BuildConfig {
      native_dir: at(&self.native_dir, project_dir.join("src/main/native")),
      configure_dir: at(&self.configure_dir, autotools_build_dir.join("configure")),
      work_dir: at(&self.work_dir, autotools_build_dir.join("work")),
      install_dir: at(&self.install_dir, autotools_build_dir.join("install")),
      dependencies_dir: at(&self.dependencies_dir, autotools_build_dir.join("dependencies")),
      autotools_dir,
      autotools_build_dir,
      verbose: self.verbose,
      autoreconf: self.autoreconf.unwrap_or(true),
      layout: self.layout,
      configure_args: self.configure_args.clone(),
      configure_env: self.configure_env.clone(),
      make_args: self.make_args.clone(),
      make_env: self.make_env.clone(),
      macro_directory: self.macro_directory.clone().unwrap_or_else(|| "m4".to_string()),
      macro_archives: self.macro_archives.iter().map(|path| project_dir.join(path)).collect(),
      post_install_script,
      pkg_config_path: self.pkg_config_path.clone(),
      force_staging: self.force_staging,
      timeout: self.timeout_secs.filter(|secs| *secs > 0).map(Duration::from_secs),
    }
  }

  /// The build platform: detected values overridden by `[environment]`.
  pub fn environment(&self) -> Environment {
    let env = &self.environment;
    let os = env.os.clone().unwrap_or_else(os::current);
    let arch = env.arch.clone().unwrap_or_else(arch::current);
    let mut environment = Environment::new(&os, &arch);
    if let Some(host) = &env.host {
      environment = environment.with_host(host.as_str());
    }
    if !env.platform_mapping.is_empty() {
      environment.apply_platform_mapping(&env.platform_mapping);
    }
    environment
  }
}
