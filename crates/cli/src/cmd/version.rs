//! Implementation of `lmvn -v` / `lmvn -V`.

use anyhow::{Context, Result};

use lmvn_lib::consts::{APP_NAME, VERSION};
use lmvn_lib::project::properties::PropertyContext;

use crate::output::print_stat;

/// Builds the property context for this invocation from the environment and `-D` definitions.
pub fn property_context(define: &[String]) -> Result<PropertyContext> {
  let mut ctx = PropertyContext::from_environment();
  for definition in define {
    ctx
      .define_pair(definition)
      .with_context(|| format!("invalid definition -D{}", definition))?;
  }
  Ok(ctx)
}

/// Prints the version and the effective tools and local repository.
pub fn cmd_version(define: &[String]) -> Result<()> {
  let ctx = property_context(define)?;
  print_version(&ctx)
}

pub fn print_version(ctx: &PropertyContext) -> Result<()> {
  println!("{} {}", APP_NAME, VERSION);
  for key in ["lmvn.java", "maven.compiler.executable", "maven.repo.local"] {
    let value = ctx.lookup(None, key).with_context(|| format!("failed to expand {}", key))?;
    print_stat(key, &value);
  }
  Ok(())
}
