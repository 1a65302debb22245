use anyhow::{Context, Result};

use autotools_lib::build::{StepOutcome, clean};

use super::Project;
use crate::output::{print_info, print_success};

pub fn cmd_clean(project: &Project) -> Result<()> {
  let dir = &project.build.autotools_build_dir;
  match clean(&project.build).context("Clean failed")? {
    StepOutcome::Ran => print_success(&format!("Removed staged symlinks below {}", dir.display())),
    _ => print_info(&format!("Nothing to clean: {} does not exist", dir.display())),
  }
  Ok(())
}
