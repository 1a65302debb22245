use anyhow::{Context, Result};

use autotools_lib::build::{Compiler, ExecutionMemo, StepOutcome};
use autotools_lib::process::DefaultProcessExecutor;

use super::Project;
use crate::output::{print_info, print_success};

pub fn cmd_check(project: &Project) -> Result<()> {
  let mut executor = DefaultProcessExecutor::new().with_timeout(project.build.timeout);
  let memo = ExecutionMemo::new();

  let rt = project.runtime()?;
  let mut compiler = Compiler::new(&project.build, &project.environment, &mut executor, &memo);
  match rt.block_on(compiler.run_checks()).context("Check failed")? {
    StepOutcome::Ran => print_success("Checks passed"),
    outcome => print_info(&format!("Checks {}", outcome.as_str())),
  }

  Ok(())
}
