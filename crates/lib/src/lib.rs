//! autotools-lib: drive GNU Autotools builds from a host build system.
//!
//! This crate provides the pieces needed to stage, configure, and build a
//! native source tree with the autotools chain:
//! - `platform`: OS/architecture detection and output directory layout
//! - `process`: external command execution with streamed output
//! - `output`: line-oriented decoding and filtering of tool output
//! - `fs`: relative paths, staleness checks, and symlink staging
//! - `build`: the compile, check, and clean goals
//! - `config`: the `autotools.toml` configuration source

pub mod build;
pub mod config;
pub mod consts;
pub mod fs;
pub mod output;
pub mod platform;
pub mod process;
pub mod util;
