//! The eight dependency views of a project and how declared scopes populate them.
//!
//! `ROOT_*` sets hold what the project itself needs; `TDEP_*` sets hold the
//! subset exposed to downstream consumers. Optional dependencies only ever
//! reach the `ROOT_*` side.

use std::collections::BTreeSet;
use std::fmt;

use crate::project::types::Ga;

/// Identifies one of the eight per-project dependency sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DepSet {
  RootMainCompile,
  RootMainPackage,
  RootMainRuntime,
  TdepMainCompile,
  TdepMainPackage,
  TdepMainRuntime,
  RootTest,
  TdepTest,
}

impl DepSet {
  pub const ALL: [DepSet; 8] = [
    DepSet::RootMainCompile,
    DepSet::RootMainPackage,
    DepSet::RootMainRuntime,
    DepSet::TdepMainCompile,
    DepSet::TdepMainPackage,
    DepSet::TdepMainRuntime,
    DepSet::RootTest,
    DepSet::TdepTest,
  ];

  fn index(self) -> usize {
    self as usize
  }

  /// The view of a dependency's own sets that a consumer of this set sees.
  pub fn transitive(self) -> DepSet {
    match self {
      DepSet::RootMainCompile | DepSet::TdepMainCompile => DepSet::TdepMainCompile,
      DepSet::RootMainPackage | DepSet::TdepMainPackage => DepSet::TdepMainPackage,
      DepSet::RootMainRuntime | DepSet::TdepMainRuntime => DepSet::TdepMainRuntime,
      DepSet::RootTest | DepSet::TdepTest => DepSet::TdepTest,
    }
  }

  pub fn name(self) -> &'static str {
    match self {
      DepSet::RootMainCompile => "ROOT_MAIN_COMPILE",
      DepSet::RootMainPackage => "ROOT_MAIN_PACKAGE",
      DepSet::RootMainRuntime => "ROOT_MAIN_RUNTIME",
      DepSet::TdepMainCompile => "TDEP_MAIN_COMPILE",
      DepSet::TdepMainPackage => "TDEP_MAIN_PACKAGE",
      DepSet::TdepMainRuntime => "TDEP_MAIN_RUNTIME",
      DepSet::RootTest => "ROOT_TEST",
      DepSet::TdepTest => "TDEP_TEST",
    }
  }
}

impl fmt::Display for DepSet {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.name())
  }
}

/// Effective scope of a declared dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
  Compile,
  Provided,
  Runtime,
  Test,
  /// Copies another project's sets and resolvers instead of adding one GA.
  Import,
}

impl Scope {
  /// Parses a `<scope>` value. Scopes with no meaning here (e.g. `system`) yield `None`.
  pub fn parse(value: &str) -> Option<Scope> {
    match value {
      "compile" => Some(Scope::Compile),
      "provided" => Some(Scope::Provided),
      "runtime" => Some(Scope::Runtime),
      "test" => Some(Scope::Test),
      "import" => Some(Scope::Import),
      _ => None,
    }
  }

  /// Sets a dependency of this scope lands in, as `(root sets, transitive sets)`.
  ///
  /// `provided` is compiled against but never packaged. `import` lands nowhere
  /// directly; it is expanded by the loader.
  pub fn placement(self) -> (&'static [DepSet], &'static [DepSet]) {
    match self {
      Scope::Compile => (
        &[
          DepSet::RootMainCompile,
          DepSet::RootMainPackage,
          DepSet::RootMainRuntime,
          DepSet::RootTest,
        ],
        &[
          DepSet::TdepMainCompile,
          DepSet::TdepMainPackage,
          DepSet::TdepMainRuntime,
          DepSet::TdepTest,
        ],
      ),
      Scope::Provided => (
        &[DepSet::RootMainCompile, DepSet::RootTest],
        &[DepSet::TdepMainCompile, DepSet::TdepTest],
      ),
      Scope::Runtime => (
        &[DepSet::RootMainPackage, DepSet::RootMainRuntime, DepSet::RootTest],
        &[DepSet::TdepMainPackage, DepSet::TdepMainRuntime, DepSet::TdepTest],
      ),
      Scope::Test => (&[DepSet::RootTest], &[]),
      Scope::Import => (&[], &[]),
    }
  }
}

/// The eight GA sets of one project, each iterating in lexicographic order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencySets {
  sets: [BTreeSet<Ga>; 8],
}

impl DependencySets {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn get(&self, set: DepSet) -> &BTreeSet<Ga> {
    &self.sets[set.index()]
  }

  /// Records a declared dependency according to its scope and optional flag.
  pub fn declare(&mut self, ga: &Ga, scope: Scope, optional: bool) {
    let (root, transitive) = scope.placement();
    for set in root {
      self.sets[set.index()].insert(ga.clone());
    }
    if !optional {
      for set in transitive {
        self.sets[set.index()].insert(ga.clone());
      }
    }
  }

  /// Inserts directly into one set.
  pub fn insert(&mut self, set: DepSet, ga: Ga) {
    self.sets[set.index()].insert(ga);
  }

  /// Unions every set of `other` into the matching set here (`import` scope).
  pub fn absorb(&mut self, other: &DependencySets) {
    for (mine, theirs) in self.sets.iter_mut().zip(other.sets.iter()) {
      mine.extend(theirs.iter().cloned());
    }
  }
}
