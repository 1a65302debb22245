//! Implementation of the `autotools compile` command.

use std::time::Instant;

use anyhow::{Context, Result};

use autotools_lib::build::{Compiler, ExecutionMemo};
use autotools_lib::process::DefaultProcessExecutor;

use super::Project;
use crate::output::{format_duration, print_report, print_stat, print_success};

/// Run the whole compile goal: stage, autogen, configure, make, post-install.
pub fn cmd_compile(project: &Project) -> Result<()> {
  let start = Instant::now();
  let mut executor = DefaultProcessExecutor::new().with_timeout(project.build.timeout);
  let memo = ExecutionMemo::new();

  let rt = project.runtime()?;
  let mut compiler = Compiler::new(&project.build, &project.environment, &mut executor, &memo);
  let report = rt.block_on(compiler.compile()).context("Compile failed")?;
  let install = compiler.install_dirs();

  println!();
  print_success("Compile complete!");
  print_report(&report);
  print_stat("Installed to", &install.prefix.display().to_string());
  print_stat("Duration", &format_duration(start.elapsed()));

  Ok(())
}
