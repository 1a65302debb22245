//! The compile, check and clean goals.
//!
//! A compile runs through fixed steps:
//!
//! - **stage**: mirror the autotools scripts and native sources into the
//!   configure directory as symlinks
//! - **autogen**: generate whatever autoconf and automake inputs are missing
//! - **configure**: run `configure` from the working directory
//! - **make**: `make` and `make install`, then fix up the install tree
//! - **post-install**: run the optional post-install script
//!
//! Autogen and configure are skipped while the working directory's
//! `Makefile` is newer than its inputs. Every step is also skipped when the
//! shared [`ExecutionMemo`] shows it already ran with the same settings.

mod autogen;
mod install;
mod macros;
mod memo;
mod types;

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use tracing::{debug, info};

pub use autogen::tool;
pub use install::InstallDirs;
pub use memo::ExecutionMemo;
pub use types::*;

use autogen::AutogenPlan;
use crate::fs::{delete_symlinks, exists_through_symlink, fix_path_for_shell, is_older_than_any, make_symlinks};
use crate::fs::{relative_path, set_executable};
use crate::output::log_sinks;
use crate::platform::Environment;
use crate::process::{Invocation, ProcessExecutor, inherited_env, shell};

/// Runs build goals for one project.
pub struct Compiler<'a, E: ProcessExecutor> {
  config: &'a BuildConfig,
  environment: &'a Environment,
  executor: &'a mut E,
  memo: &'a ExecutionMemo,
}

impl<'a, E: ProcessExecutor> Compiler<'a, E> {
  pub fn new(
    config: &'a BuildConfig,
    environment: &'a Environment,
    executor: &'a mut E,
    memo: &'a ExecutionMemo,
  ) -> Self {
    Self {
      config,
      environment,
      executor,
      memo,
    }
  }

  /// Stage, generate, configure, build and install.
  pub async fn compile(&mut self) -> Result<BuildReport, BuildError> {
    self.init_logging();
    let mut report = BuildReport::default();

    report.record(Step::Stage, self.stage().await?);
    if self.makefile_is_current() {
      info!(work_dir = %self.config.work_dir.display(), "Makefile is up to date, skipping autogen and configure");
      report.record(Step::Autogen, StepOutcome::UpToDate);
      report.record(Step::Configure, StepOutcome::UpToDate);
    } else {
      report.record(Step::Autogen, self.autogen().await?);
      report.record(Step::Configure, self.configure().await?);
    }
    report.record(Step::Make, self.make().await?);
    report.record(Step::PostInstall, self.post_install().await?);
    Ok(report)
  }

  /// Create the build directories and symlink the sources into them.
  pub async fn stage(&mut self) -> Result<StepOutcome, BuildError> {
    if self.repeated(Step::Stage) {
      return Ok(StepOutcome::Repeated);
    }
    let config = self.config;
    if !config.native_dir.is_dir() && !config.autotools_dir.is_dir() {
      return Err(BuildError::Config {
        message: format!(
          "neither the native source directory {} nor the autotools directory {} exists",
          config.native_dir.display(),
          config.autotools_dir.display()
        ),
      });
    }

    for dir in [&config.configure_dir, &config.work_dir, &config.install_dir] {
      fs::create_dir_all(dir).map_err(BuildError::io(dir))?;
    }
    make_symlinks(&config.autotools_dir, &config.configure_dir, config.force_staging).await?;
    make_symlinks(&config.native_dir, &config.configure_dir, config.force_staging).await?;

    if !exists_through_symlink(&config.configure_dir, &config.macro_directory) {
      let macro_dir = config.configure_dir.join(&config.macro_directory);
      fs::create_dir_all(&macro_dir).map_err(BuildError::io(&macro_dir))?;
    }
    let appended = macros::write_acinclude(
      &config.configure_dir,
      &config.macro_archives,
      &config.autotools_dir.join(&config.macro_directory),
    )?;
    if appended > 0 {
      info!(count = appended, "wrote acinclude.m4");
    }

    // Hand-written makefiles rarely cope with sources in a sibling directory.
    if !exists_through_symlink(&config.configure_dir, "Makefile.am") {
      make_symlinks(&config.native_dir, &config.work_dir, config.force_staging).await?;
    }
    Ok(StepOutcome::Ran)
  }

  /// Generate the missing autotools inputs in the configure directory.
  pub async fn autogen(&mut self) -> Result<StepOutcome, BuildError> {
    if self.repeated(Step::Autogen) {
      return Ok(StepOutcome::Repeated);
    }
    let config = self.config;
    let plan = AutogenPlan::for_directory(&config.configure_dir, config.autoreconf, config.verbose);
    if plan.is_empty() {
      debug!("autotools inputs are complete");
      return Ok(StepOutcome::UpToDate);
    }

    // Removed on drop, also when a command fails.
    let mut autoscan_post = None;
    let mut commands = Vec::new();
    if plan.autoscan {
      let script = autogen::write_autoscan_post(&config.configure_dir, &config.native_dir)?;
      commands.push(tool("autoscan"));
      if let Some(name) = script.file_name() {
        commands.push(format!("./{}", name.to_string_lossy()));
      }
      autoscan_post = Some(script);
    }
    commands.extend(plan.commands.iter().cloned());
    if plan.placeholders {
      autogen::create_placeholders(&config.configure_dir)?;
    }

    self.announce_directory(&config.configure_dir);
    for command in commands {
      let invocation = Invocation::shell(&command, &config.configure_dir);
      self.run(Step::Autogen, &invocation).await?;
    }
    drop(autoscan_post);
    Ok(StepOutcome::Ran)
  }

  /// Run `configure` in the working directory.
  pub async fn configure(&mut self) -> Result<StepOutcome, BuildError> {
    if self.repeated(Step::Configure) {
      return Ok(StepOutcome::Repeated);
    }
    let config = self.config;
    let script = config.configure_dir.join("configure");
    if script.exists() {
      set_executable(&script).map_err(BuildError::io(&script))?;
    }
    let mut relative = relative_path(&config.work_dir, &script).map_err(BuildError::io(&script))?;
    // A bare name would be looked up on PATH.
    if !relative.contains('/') {
      relative.insert_str(0, "./");
    }

    let mut args = vec![relative];
    if !config.verbose {
      args.push("--silent".to_string());
    }
    let dirs = self.install_dirs();
    match config.layout {
      Layout::Prefix => args.push(format!("--prefix={}", shell_path(&dirs.prefix))),
      Layout::Legacy => {
        args.push(format!("--bindir={}", shell_path(&dirs.bin)));
        args.push(format!("--libdir={}", shell_path(&dirs.lib)));
        args.push(format!("--includedir={}", shell_path(&dirs.include)));
      }
    }
    if let Some(host) = self.environment.host() {
      args.push(format!("--host={host}"));
    }
    args.extend(config.configure_args.iter().cloned());

    let invocation = Invocation::shell(shell::join(&args), &config.work_dir).with_env(self.configure_env());
    self.announce_directory(&config.work_dir);
    self.run(Step::Configure, &invocation).await?;
    Ok(StepOutcome::Ran)
  }

  /// Run `make` and `make install`, then fix up the installed files.
  pub async fn make(&mut self) -> Result<StepOutcome, BuildError> {
    if self.repeated(Step::Make) {
      return Ok(StepOutcome::Repeated);
    }
    let config = self.config;
    let env = self.make_env();
    let make_argv = std::iter::once("make".to_string()).chain(config.make_args.iter().cloned());
    let mut build = Invocation::new(make_argv, &config.work_dir);
    let mut install = Invocation::new(["make", "install"], &config.work_dir);
    if let Some(env) = env {
      build = build.with_env(env.clone());
      install = install.with_env(env);
    }

    self.announce_directory(&config.work_dir);
    self.run(Step::Make, &build).await?;
    self.run(Step::Make, &install).await?;

    let dirs = self.install_dirs();
    if self.environment.is_windows() {
      let moved = install::relocate_dlls(&dirs)?;
      if moved > 0 {
        info!(count = moved, lib = %dirs.lib.display(), "moved DLLs into lib directory");
      }
    }
    install::replace_install_placeholder(&dirs)?;
    Ok(StepOutcome::Ran)
  }

  /// Run the post-install script, if there is one, in the install directory.
  pub async fn post_install(&mut self) -> Result<StepOutcome, BuildError> {
    let config = self.config;
    let Some(script) = config.post_install_script.as_deref().filter(|script| script.is_file()) else {
      return Ok(StepOutcome::Skipped);
    };
    if self.repeated(Step::PostInstall) {
      return Ok(StepOutcome::Repeated);
    }
    fs::create_dir_all(&config.install_dir).map_err(BuildError::io(&config.install_dir))?;
    let invocation = Invocation::new([shell::SHELL.to_string(), script.display().to_string()], &config.install_dir);
    self.announce_directory(&config.install_dir);
    self.run(Step::PostInstall, &invocation).await?;
    Ok(StepOutcome::Ran)
  }

  /// Run `make check` in the working directory.
  pub async fn run_checks(&mut self) -> Result<StepOutcome, BuildError> {
    self.init_logging();
    if self.repeated(Step::Check) {
      return Ok(StepOutcome::Repeated);
    }
    let config = self.config;
    if !config.work_dir.join("Makefile").exists() {
      return Err(BuildError::Config {
        message: format!("no Makefile in {}; run the compile goal first", config.work_dir.display()),
      });
    }
    let mut invocation = Invocation::new(["make", "check"], &config.work_dir);
    if let Some(env) = self.make_env() {
      invocation = invocation.with_env(env);
    }
    self.announce_directory(&config.work_dir);
    self.run(Step::Check, &invocation).await?;
    Ok(StepOutcome::Ran)
  }

  /// Install directories for the configured layout.
  pub fn install_dirs(&self) -> InstallDirs {
    let install_dir = &self.config.install_dir;
    match self.config.layout {
      Layout::Prefix => {
        let prefix = self.environment.make_os_arch_directory(install_dir);
        InstallDirs {
          bin: prefix.join("bin"),
          lib: prefix.join("lib"),
          include: prefix.join("include"),
          prefix,
        }
      }
      Layout::Legacy => InstallDirs {
        prefix: install_dir.clone(),
        bin: self.environment.make_os_arch_directory(&install_dir.join("bin")),
        lib: self.environment.make_os_arch_directory(&install_dir.join("lib")),
        include: install_dir.join("include"),
      },
    }
  }

  /// Environment for `configure`: inherited variables, user overrides, then
  /// compiler flags pointing at the unpacked dependencies.
  fn configure_env(&self) -> BTreeMap<String, String> {
    let config = self.config;
    let mut env = inherited_env();
    env.extend(config.configure_env.clone());

    let dependencies = self.environment.make_os_arch_directory(&config.dependencies_dir);
    let include_flag = format!("-I{}", shell_path(&dependencies.join("include")));
    merge_flag(&mut env, "CFLAGS", &include_flag);
    merge_flag(&mut env, "CXXFLAGS", &include_flag);
    merge_flag(&mut env, "LDFLAGS", &format!("-L{}", shell_path(&dependencies.join("lib"))));

    let pkgconfig = dependencies.join("lib").join("pkgconfig");
    if let Some(path) = &config.pkg_config_path {
      env.insert("PKG_CONFIG_PATH".to_string(), path.clone());
    } else if pkgconfig.is_dir() {
      env.insert("PKG_CONFIG_PATH".to_string(), shell_path(&pkgconfig));
    }
    env
  }

  fn make_env(&self) -> Option<BTreeMap<String, String>> {
    if self.config.make_env.is_empty() {
      return None;
    }
    let mut env = inherited_env();
    env.extend(self.config.make_env.clone());
    Some(env)
  }

  /// Whether the working directory holds a Makefile newer than its inputs.
  fn makefile_is_current(&self) -> bool {
    let config = self.config;
    let makefile = config.work_dir.join("Makefile");
    if !makefile.exists() {
      return false;
    }
    let inputs = ["Makefile.in", "Makefile.am", "configure"].map(|name| config.configure_dir.join(name));
    !is_older_than_any(&makefile, &inputs)
  }

  fn repeated(&self, step: Step) -> bool {
    let mut parts = vec![step.as_str().to_string()];
    parts.extend(self.config.fingerprint());
    let repeated = self.memo.already_run(parts);
    if repeated {
      info!(step = %step, "skipping repeated execution");
    }
    repeated
  }

  fn init_logging(&mut self) {
    let (stdout, stderr) = log_sinks();
    self.executor.set_sinks(stdout, stderr);
  }

  fn announce_directory(&self, dir: &Path) {
    if self.config.verbose {
      info!("cd '{}'", dir.display());
    } else {
      debug!("cd '{}'", dir.display());
    }
  }

  async fn run(&mut self, step: Step, invocation: &Invocation) -> Result<(), BuildError> {
    if self.config.verbose {
      info!(step = %step, "{}", invocation.command_line());
    } else {
      debug!(step = %step, "{}", invocation.command_line());
    }
    self.executor.execute(invocation).await.map_err(BuildError::step(step))
  }
}

/// Delete the symlinks staged under the autotools build directory.
pub fn clean(config: &BuildConfig) -> Result<StepOutcome, BuildError> {
  if !config.autotools_build_dir.exists() {
    return Ok(StepOutcome::Skipped);
  }
  info!(dir = %config.autotools_build_dir.display(), "deleting staged symlinks");
  delete_symlinks(&config.autotools_build_dir)?;
  Ok(StepOutcome::Ran)
}

fn shell_path(path: &Path) -> String {
  fix_path_for_shell(&path.display().to_string())
}

/// Append `value` to the space-separated variable `key`.
fn merge_flag(env: &mut BTreeMap<String, String>, key: &str, value: &str) {
  let merged = match env.get(key) {
    Some(existing) if !existing.is_empty() => format!("{existing} {value}"),
    _ => value.to_string(),
  };
  env.insert(key.to_string(), merged);
}
