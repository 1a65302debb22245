//! Implementation of the `autotools info` command.

use std::path::PathBuf;

use anyhow::Result;
use serde::Serialize;

use autotools_lib::build::{BuildConfig, Layout};

use super::Project;
use crate::output::{print_json, print_stat};

#[derive(Serialize)]
struct Info<'a> {
  project_dir: &'a PathBuf,
  config_file: &'a PathBuf,
  os: String,
  arch: String,
  detected_os: &'a str,
  detected_arch: &'a str,
  host: Option<&'a str>,
  classifier: String,
  cross_compiling: bool,
  install_prefix: PathBuf,
  build: &'a BuildConfig,
}

pub fn cmd_info(project: &Project, json: bool) -> Result<()> {
  let environment = &project.environment;
  let build = &project.build;
  let install_prefix = match build.layout {
    Layout::Prefix => environment.make_os_arch_directory(&build.install_dir),
    Layout::Legacy => build.install_dir.clone(),
  };
  let info = Info {
    project_dir: &project.dir,
    config_file: &project.config_file,
    os: environment.operating_system(),
    arch: environment.architecture(),
    detected_os: environment.detected_os(),
    detected_arch: environment.detected_arch(),
    host: environment.host(),
    classifier: environment.classifier(),
    cross_compiling: environment.is_cross_compiling(),
    install_prefix,
    build,
  };

  if json {
    return print_json(&info);
  }

  println!("Platform:");
  print_stat("OS", &info.os);
  print_stat("Arch", &info.arch);
  if (info.os.as_str(), info.arch.as_str()) != (info.detected_os, info.detected_arch) {
    print_stat("Detected", &format!("{}/{}", info.detected_os, info.detected_arch));
  }
  print_stat("Host", info.host.unwrap_or("(native)"));
  print_stat("Classifier", &info.classifier);
  println!("Directories:");
  print_stat("Project", &info.project_dir.display().to_string());
  print_stat("Config", &info.config_file.display().to_string());
  print_stat("Native sources", &build.native_dir.display().to_string());
  print_stat("Autotools sources", &build.autotools_dir.display().to_string());
  print_stat("Configure", &build.configure_dir.display().to_string());
  print_stat("Work", &build.work_dir.display().to_string());
  print_stat("Install prefix", &info.install_prefix.display().to_string());
  print_stat("Dependencies", &build.dependencies_dir.display().to_string());
  Ok(())
}
