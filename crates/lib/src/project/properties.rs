//! Property lookup and `${...}` templating.
//!
//! Lookup order for a key:
//! 1. `maven.build.timestamp` / `build.timestamp`
//! 2. `basedir` and `project.*` from the project in scope
//! 3. command-line definitions (`-D`)
//! 4. the project's own `<properties>`
//! 5. system defaults and the environment (`env.*`)
//!
//! Missing keys expand to the empty string.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::consts::MAX_TEMPLATE_DEPTH;
use crate::platform::paths::{JavaTools, default_local_repo};

/// Errors raised while expanding property templates.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PropertyError {
  /// `${` without a matching `}`.
  #[error("unclosed template in '{text}'")]
  Unclosed { text: String },

  /// A property refers to itself, directly or indirectly.
  #[error("property '{key}' expands recursively")]
  Recursion { key: String },
}

/// The project-side half of a lookup: its properties and base directory.
#[derive(Debug, Clone, Copy)]
pub struct PropertyScope<'a> {
  pub properties: &'a BTreeMap<String, String>,
  pub basedir: Option<&'a Path>,
}

/// Process-wide property sources.
#[derive(Debug, Clone)]
pub struct PropertyContext {
  cmdline: BTreeMap<String, String>,
  system: BTreeMap<String, String>,
  build_start: DateTime<Utc>,
}

impl Default for PropertyContext {
  fn default() -> Self {
    Self::new(Utc::now())
  }
}

impl PropertyContext {
  /// An empty context: no defaults, no environment.
  pub fn new(build_start: DateTime<Utc>) -> Self {
    Self {
      cmdline: BTreeMap::new(),
      system: BTreeMap::new(),
      build_start,
    }
  }

  /// A context seeded with the environment and the built-in defaults.
  pub fn from_environment() -> Self {
    let mut ctx = Self::new(Utc::now());
    for (key, value) in std::env::vars_os() {
      if let (Some(key), Some(value)) = (key.to_str(), value.to_str()) {
        ctx.set_default(&format!("env.{}", key.to_uppercase()), value);
      }
    }
    ctx.apply_builtin_defaults(&JavaTools::detect());
    ctx
  }

  /// Installs the built-in defaults without overriding anything already set.
  pub fn apply_builtin_defaults(&mut self, tools: &JavaTools) {
    self.set_default("lmvn.java", &tools.java);
    self.set_default("maven.compiler.executable", &tools.javac);
    self.set_default("maven.repo.local", &default_local_repo().display().to_string());
    self.set_default("maven.build.timestamp.format", "yyyy-MM-dd'T'HH:mm:ss'Z'");
    self.set_default("maven.compiler.source", "1.8");
    self.set_default("maven.compiler.target", "1.8");
    self.set_default("maven.compiler.showWarnings", "true");
    self.set_default("maven.compiler.debug", "true");
    self.set_default("maven.compiler.parameters", "false");
    self.set_default("maven.compiler.verbose", "false");
    self.set_default("maven.compiler.showDeprecation", "false");
    self.set_default("lmvn.testMainClass", "org.junit.runner.JUnitCore");
    self.set_default("lmvn.testMarker", "Lorg/junit/Test;");
  }

  /// Sets a system-level value unless one exists.
  pub fn set_default(&mut self, key: &str, value: &str) {
    self.system.entry(key.to_string()).or_insert_with(|| value.to_string());
  }

  /// Records a `-D` definition. The value is expanded immediately, outside any project.
  pub fn define(&mut self, key: &str, raw_value: &str) -> Result<(), PropertyError> {
    let value = self.template(None, raw_value)?;
    self.cmdline.insert(key.to_string(), value);
    Ok(())
  }

  /// Parses `key=value` (or bare `key`, meaning `true`) and records it.
  pub fn define_pair(&mut self, definition: &str) -> Result<(), PropertyError> {
    match definition.split_once('=') {
      Some((key, value)) => self.define(key, value),
      None => {
        self.cmdline.insert(definition.to_string(), "true".to_string());
        Ok(())
      }
    }
  }

  pub fn cmdline(&self, key: &str) -> Option<&str> {
    self.cmdline.get(key).map(String::as_str)
  }

  pub fn build_start(&self) -> DateTime<Utc> {
    self.build_start
  }

  pub fn lookup(&self, scope: Option<&PropertyScope<'_>>, key: &str) -> Result<String, PropertyError> {
    self.lookup_at(scope, key, 0)
  }

  pub fn template(&self, scope: Option<&PropertyScope<'_>>, text: &str) -> Result<String, PropertyError> {
    self.template_at(scope, text, 0)
  }

  fn lookup_at(&self, scope: Option<&PropertyScope<'_>>, key: &str, depth: usize) -> Result<String, PropertyError> {
    if depth > MAX_TEMPLATE_DEPTH {
      return Err(PropertyError::Recursion { key: key.to_string() });
    }

    if key == "build.timestamp" || key == "maven.build.timestamp" {
      let pattern = self.lookup_at(scope, "maven.build.timestamp.format", depth + 1)?;
      return Ok(format_timestamp(&self.build_start, &pattern));
    }

    if let Some(scope) = scope {
      if key == "project.basedir" || key == "basedir" {
        if let Some(dir) = scope.basedir {
          return Ok(dir.display().to_string());
        }
      }
      if key.starts_with("project.") {
        return match scope.properties.get(key) {
          Some(value) => self.template_at(Some(scope), value, depth + 1),
          None => Ok(String::new()),
        };
      }
    }

    if let Some(value) = self.cmdline.get(key) {
      return Ok(value.clone());
    }

    if let Some(value) = scope.and_then(|s| s.properties.get(key)) {
      return self.template_at(scope, value, depth + 1);
    }

    Ok(self.system.get(key).cloned().unwrap_or_default())
  }

  fn template_at(&self, scope: Option<&PropertyScope<'_>>, text: &str, depth: usize) -> Result<String, PropertyError> {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find("${") {
      out.push_str(&rest[..start]);
      let after = &rest[start + 2..];
      let end = after.find('}').ok_or_else(|| PropertyError::Unclosed { text: text.to_string() })?;
      out.push_str(&self.lookup_at(scope, &after[..end], depth + 1)?);
      rest = &after[end + 1..];
    }
    out.push_str(rest);
    Ok(out)
  }
}

/// Formats `at` with a `SimpleDateFormat`-style pattern.
///
/// Supports `yyyy yy MM dd HH mm ss SSS` and single-quoted literals; other
/// characters are copied as-is.
pub fn format_timestamp(at: &DateTime<Utc>, pattern: &str) -> String {
  at.format(&java_pattern_to_strftime(pattern)).to_string()
}

fn java_pattern_to_strftime(pattern: &str) -> String {
  let chars: Vec<char> = pattern.chars().collect();
  let mut out = String::new();
  let mut i = 0;
  while i < chars.len() {
    let c = chars[i];
    if c == '\'' {
      // '' is an escaped quote, otherwise copy until the closing quote
      if chars.get(i + 1) == Some(&'\'') {
        out.push('\'');
        i += 2;
        continue;
      }
      i += 1;
      while i < chars.len() && chars[i] != '\'' {
        push_literal(&mut out, chars[i]);
        i += 1;
      }
      i += 1;
      continue;
    }

    let run = chars[i..].iter().take_while(|&&x| x == c).count();
    let spec = match (c, run) {
      ('y', 2) => Some("%y"),
      ('y', _) => Some("%Y"),
      ('M', _) => Some("%m"),
      ('d', _) => Some("%d"),
      ('H', _) => Some("%H"),
      ('m', _) => Some("%M"),
      ('s', _) => Some("%S"),
      ('S', _) => Some("%3f"),
      _ => None,
    };
    match spec {
      Some(spec) => out.push_str(spec),
      None => (0..run).for_each(|_| push_literal(&mut out, c)),
    }
    i += run;
  }
  out
}

fn push_literal(out: &mut String, c: char) {
  if c == '%' {
    out.push_str("%%");
  } else {
    out.push(c);
  }
}
