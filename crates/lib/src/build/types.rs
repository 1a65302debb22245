use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::fs::SymlinkError;
use crate::process::ProcessError;

/// How install directories are passed to `configure`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layout {
  /// A single `--prefix=<install>/<os>/<arch>`.
  #[default]
  Prefix,
  /// Separate `--bindir`, `--libdir` and `--includedir` options.
  Legacy,
}

/// Fully resolved settings for one build.
///
/// All paths are absolute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildConfig {
  pub native_dir: PathBuf,
  pub autotools_dir: PathBuf,
  /// `<build_dir>/autotools`, the tree the clean goal walks.
  pub autotools_build_dir: PathBuf,
  pub configure_dir: PathBuf,
  pub work_dir: PathBuf,
  pub install_dir: PathBuf,
  pub dependencies_dir: PathBuf,
  pub verbose: bool,
  pub autoreconf: bool,
  pub layout: Layout,
  pub configure_args: Vec<String>,
  pub configure_env: BTreeMap<String, String>,
  pub make_args: Vec<String>,
  pub make_env: BTreeMap<String, String>,
  pub macro_directory: String,
  pub macro_archives: Vec<PathBuf>,
  pub post_install_script: Option<PathBuf>,
  pub pkg_config_path: Option<String>,
  pub force_staging: bool,
  pub timeout: Option<Duration>,
}

impl BuildConfig {
  /// Default layout for a project rooted at `project_dir`.
  pub fn for_project(project_dir: &Path) -> Self {
    let build_root = project_dir.join("target").join(crate::consts::AUTOTOOLS_DIR);
    let autotools_dir = project_dir.join("src/main/autotools");
    Self {
      native_dir: project_dir.join("src/main/native"),
      post_install_script: Some(autotools_dir.join("postinstall.sh")),
      autotools_dir,
      configure_dir: build_root.join("configure"),
      work_dir: build_root.join("work"),
      install_dir: build_root.join("install"),
      dependencies_dir: build_root.join("dependencies"),
      autotools_build_dir: build_root,
      verbose: false,
      autoreconf: true,
      layout: Layout::Prefix,
      configure_args: Vec::new(),
      configure_env: BTreeMap::new(),
      make_args: Vec::new(),
      make_env: BTreeMap::new(),
      macro_directory: "m4".to_string(),
      macro_archives: Vec::new(),
      pkg_config_path: None,
      force_staging: false,
      timeout: None,
    }
  }

  /// Values identifying this build for the repeated-execution memo.
  pub fn fingerprint(&self) -> Vec<String> {
    [
      &self.native_dir,
      &self.autotools_dir,
      &self.install_dir,
      &self.work_dir,
      &self.configure_dir,
      &self.dependencies_dir,
    ]
    .iter()
    .map(|path| path.display().to_string())
    .collect()
  }
}

/// A phase of the compile goal, or one of the auxiliary goals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
  Stage,
  Autogen,
  Configure,
  Make,
  PostInstall,
  Check,
}

impl Step {
  pub fn as_str(&self) -> &'static str {
    match self {
      Step::Stage => "stage",
      Step::Autogen => "autogen",
      Step::Configure => "configure",
      Step::Make => "make",
      Step::PostInstall => "post-install",
      Step::Check => "check",
    }
  }
}

impl fmt::Display for Step {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Whether a step did work or was skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
  Ran,
  /// Already executed with the same fingerprint in this session.
  Repeated,
  /// Outputs were already up to date.
  UpToDate,
  /// Nothing to do for this project.
  Skipped,
}

impl StepOutcome {
  pub fn as_str(&self) -> &'static str {
    match self {
      StepOutcome::Ran => "ran",
      StepOutcome::Repeated => "repeated",
      StepOutcome::UpToDate => "up to date",
      StepOutcome::Skipped => "skipped",
    }
  }
}

/// Steps of one goal with what became of each.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
  pub steps: Vec<(Step, StepOutcome)>,
}

impl BuildReport {
  pub(crate) fn record(&mut self, step: Step, outcome: StepOutcome) {
    self.steps.push((step, outcome));
  }

  pub fn outcome(&self, step: Step) -> Option<StepOutcome> {
    self.steps.iter().find(|(s, _)| *s == step).map(|(_, outcome)| *outcome)
  }

  /// Number of steps that did work.
  pub fn ran(&self) -> usize {
    self.steps.iter().filter(|(_, outcome)| *outcome == StepOutcome::Ran).count()
  }
}

/// Errors that abort a build goal.
#[derive(Debug, Error)]
pub enum BuildError {
  #[error("configuration error: {message}")]
  Config { message: String },

  #[error("{step} step failed: {source}")]
  Step {
    step: Step,
    #[source]
    source: ProcessError,
  },

  #[error(transparent)]
  Symlink(#[from] SymlinkError),

  #[error("io error at {}: {source}", .path.display())]
  Io {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to read macro archive {}: {source}", .archive.display())]
  Macro {
    archive: PathBuf,
    #[source]
    source: zip::result::ZipError,
  },

  #[error("invalid macro pattern: {0}")]
  Pattern(#[from] regex::Error),
}

impl BuildError {
  pub(crate) fn io(path: &Path) -> impl FnOnce(io::Error) -> Self + '_ {
    move |source| BuildError::Io {
      path: path.to_path_buf(),
      source,
    }
  }

  pub(crate) fn step(step: Step) -> impl FnOnce(ProcessError) -> Self {
    move |source| BuildError::Step { step, source }
  }
}
