//! Descriptor loading and the node cache.
//!
//! Every project is loaded at most once. Loading is two-phase: a node is
//! built completely (parent and imports included) and cached before anything
//! reachable through its `<modules>` is looked at, so a module pointing back
//! at its aggregator through `<relativePath>` finds it in the cache. Loading a
//! source project registers all of its modules as source nodes too, which lets
//! a module built on its own resolve its siblings without the local repository.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use tracing::{debug, trace, warn};

use crate::consts::DESCRIPTOR_FILE_NAME;
use crate::project::descriptor::{Descriptor, RawReference};
use crate::project::properties::PropertyContext;
use crate::project::{Coordinate, DescriptorError, Ga, Packaging, ProjectError, ProjectNode, Scope};
use crate::resolve::{CoordinateResolver, PinnedResolver, ProjectSource};
use crate::store::{ArtifactKind, ArtifactStore};

/// Inheritable defaults applied after the parent is folded in.
const INHERITED_DEFAULTS: &[(&str, &str)] = &[
  ("project.build.sourceEncoding", "UTF-8"),
  ("project.build.sourceDirectory", "${basedir}/src/main/java"),
  ("project.build.testSourceDirectory", "${basedir}/src/test/java"),
  ("project.build.resources.resource.directory", "${basedir}/src/main/resources"),
  (
    "project.build.testResources.testResource.directory",
    "${basedir}/src/test/resources",
  ),
];

/// Owns every loaded [`ProjectNode`], the artifact store and the property context.
pub struct ProjectRegistry {
  by_path: HashMap<PathBuf, Rc<ProjectNode>>,
  by_coordinate: HashMap<Coordinate, Rc<ProjectNode>>,
  in_progress: HashSet<PathBuf>,
  store: ArtifactStore,
  properties: PropertyContext,
}

impl ProjectRegistry {
  pub fn new(store: ArtifactStore, properties: PropertyContext) -> Self {
    Self {
      by_path: HashMap::new(),
      by_coordinate: HashMap::new(),
      in_progress: HashSet::new(),
      store,
      properties,
    }
  }

  pub fn store(&self) -> &ArtifactStore {
    &self.store
  }

  pub fn store_mut(&mut self) -> &mut ArtifactStore {
    &mut self.store
  }

  pub fn properties(&self) -> &PropertyContext {
    &self.properties
  }

  pub fn properties_mut(&mut self) -> &mut PropertyContext {
    &mut self.properties
  }

  /// The cached node for `coordinate`, if it has been loaded.
  pub fn get(&self, coordinate: &Coordinate) -> Option<Rc<ProjectNode>> {
    self.by_coordinate.get(coordinate).cloned()
  }

  /// Loads a source project from a descriptor file or a directory containing one.
  pub fn load_source(&mut self, path: &Path) -> Result<Rc<ProjectNode>, ProjectError> {
    self.load(path, true)
  }

  /// Loads a descriptor as a repository project (no sources, no modules).
  pub fn load_repository(&mut self, path: &Path) -> Result<Rc<ProjectNode>, ProjectError> {
    self.load(path, false)
  }

  /// Loads the source project at `path` followed by every project reachable
  /// through `<modules>`, depth-first, each coordinate once.
  pub fn load_aggregate(&mut self, path: &Path) -> Result<Vec<Rc<ProjectNode>>, ProjectError> {
    let root = self.load_source(path)?;
    let mut out = Vec::new();
    let mut visited = HashSet::new();
    self.collect_modules(root, &mut out, &mut visited)?;
    debug!(count = out.len(), "aggregate loaded");
    Ok(out)
  }

  fn collect_modules(
    &mut self,
    node: Rc<ProjectNode>,
    out: &mut Vec<Rc<ProjectNode>>,
    visited: &mut HashSet<Coordinate>,
  ) -> Result<(), ProjectError> {
    if !visited.insert(node.coordinate.clone()) {
      return Ok(());
    }
    out.push(Rc::clone(&node));
    for module in &node.modules {
      let child = self.load_source(module)?;
      self.collect_modules(child, out, visited)?;
    }
    Ok(())
  }

  fn load(&mut self, path: &Path, source: bool) -> Result<Rc<ProjectNode>, ProjectError> {
    let read_error = |source| DescriptorError::Read {
      path: path.to_path_buf(),
      source,
    };
    let mut file = dunce::canonicalize(path).map_err(read_error)?;
    if file.is_dir() {
      file = file.join(DESCRIPTOR_FILE_NAME);
    }

    if let Some(node) = self.by_path.get(&file) {
      return Ok(Rc::clone(node));
    }
    if !self.in_progress.insert(file.clone()) {
      return Err(DescriptorError::Cycle { path: file }.into());
    }

    trace!(path = %file.display(), source, "loading descriptor");
    let built = fs::read(&file)
      .map_err(|source| DescriptorError::Read {
        path: file.clone(),
        source,
      })
      .map_err(ProjectError::from)
      .and_then(|bytes| {
        let source_dir = if source { file.parent().map(Path::to_path_buf) } else { None };
        self.build(bytes, &file.display().to_string(), source_dir)
      });
    self.in_progress.remove(&file);

    let node = self.remember(Rc::new(built?));
    self.by_path.insert(file, Rc::clone(&node));
    if source {
      self.load_modules(&node)?;
    }
    Ok(node)
  }

  /// Registers every declared module as a source node.
  ///
  /// A module that is still being loaded further up the stack is skipped; it
  /// registers itself once its own load returns.
  fn load_modules(&mut self, node: &ProjectNode) -> Result<(), ProjectError> {
    for module in &node.modules {
      let mut file = dunce::canonicalize(module).map_err(|source| DescriptorError::Read {
        path: module.clone(),
        source,
      })?;
      if file.is_dir() {
        file = file.join(DESCRIPTOR_FILE_NAME);
      }
      if self.in_progress.contains(&file) {
        trace!(path = %file.display(), "module already loading");
        continue;
      }
      self.load_source(&file)?;
    }
    Ok(())
  }

  /// Caches `node` by coordinate. A source node displaces a repository node
  /// for the same coordinate; otherwise the first node loaded stays.
  fn remember(&mut self, node: Rc<ProjectNode>) -> Rc<ProjectNode> {
    match self.by_coordinate.get(&node.coordinate) {
      Some(existing) if existing.is_source() || !node.is_source() => {
        debug!(coordinate = %node.coordinate, "coordinate already loaded");
        Rc::clone(existing)
      }
      _ => {
        self.by_coordinate.insert(node.coordinate.clone(), Rc::clone(&node));
        node
      }
    }
  }

  fn build(&mut self, bytes: Vec<u8>, origin: &str, source_dir: Option<PathBuf>) -> Result<ProjectNode, ProjectError> {
    let descriptor = Descriptor::parse(&bytes, origin)?;
    let mut node = ProjectNode::new(Coordinate::new("", "", ""));
    node.source_dir = source_dir;
    node.descriptor = bytes;

    node.properties.insert("project.packaging".to_string(), "jar".to_string());
    for (key, value) in descriptor.properties() {
      node.properties.insert(key.to_string(), value.to_string());
    }
    for (key, value) in descriptor.bound_properties() {
      node.properties.insert(key, value.to_string());
    }

    if let Some(reference) = descriptor.parent()? {
      let ga = self.register_reference(&mut node, origin, &reference)?;
      let Some(resolver) = node.resolvers.get(&ga).cloned() else {
        return Err(
          DescriptorError::UnversionedParent {
            origin: origin.to_string(),
            ga: ga.to_string(),
          }
          .into(),
        );
      };
      let parent = resolver.resolve(&mut *self)?;
      for (key, value) in &parent.properties {
        if key != "project.artifactId" {
          node.properties.entry(key.clone()).or_insert_with(|| value.clone());
        }
      }
      fold_resolvers(&mut node.resolvers, &parent.resolvers);
      node.parent = Some(parent);
    }

    for (key, value) in INHERITED_DEFAULTS {
      node
        .properties
        .entry(key.to_string())
        .or_insert_with(|| value.to_string());
    }

    let group = self.expand(&node, origin, "${project.groupId}")?;
    let artifact = self.expand(&node, origin, "${project.artifactId}")?;
    let version = self.expand(&node, origin, "${project.version}")?;
    if group.is_empty() || artifact.is_empty() || version.is_empty() {
      return Err(
        DescriptorError::MissingCoordinate {
          origin: origin.to_string(),
          triple: format!("{}:{}:{}", group, artifact, version),
        }
        .into(),
      );
    }
    node.coordinate = Coordinate::new(group, artifact, version);
    node.packaging = Packaging::parse(&self.expand(&node, origin, "${project.packaging}")?);
    debug!(coordinate = %node.coordinate, origin, "descriptor loaded");

    for url in descriptor.repositories() {
      let url = self.expand(&node, origin, url)?;
      if !url.is_empty() {
        self.store.add_repository(&url);
      }
    }

    for dependency in descriptor.dependencies()? {
      let ga = self.register_reference(&mut node, origin, &dependency.reference)?;
      let scope_text = match dependency.scope {
        Some(raw) => self.expand(&node, origin, raw)?,
        None => "compile".to_string(),
      };
      let optional = match dependency.optional {
        Some(raw) => self.expand(&node, origin, raw)? == "true",
        None => false,
      };
      let Some(scope) = Scope::parse(&scope_text) else {
        debug!(ga = %ga, scope = %scope_text, "skipping dependency with unsupported scope");
        continue;
      };
      if scope == Scope::Import {
        let Some(resolver) = node.resolvers.get(&ga).cloned() else {
          return Err(
            DescriptorError::UnversionedImport {
              origin: origin.to_string(),
              ga: ga.to_string(),
            }
            .into(),
          );
        };
        let imported = resolver.resolve(&mut *self)?;
        node.dependencies.absorb(&imported.dependencies);
        fold_resolvers(&mut node.resolvers, &imported.resolvers);
      } else {
        node.dependencies.declare(&ga, scope, optional);
      }
    }

    if let Some(dir) = node.source_dir.clone() {
      for module in descriptor.modules() {
        let module = self.expand(&node, origin, module)?;
        node.modules.push(dir.join(module));
      }
    }

    node.main_class = match descriptor.main_class() {
      Some(raw) => Some(self.expand(&node, origin, raw)?),
      None => None,
    };
    for arg in descriptor.compiler_args() {
      let arg = self.expand(&node, origin, arg)?;
      node.compiler_args.push(arg);
    }

    if node.is_source()
      && node.properties.contains_key("maven.compiler.executable")
      && !node.properties.contains_key("maven.compiler.fork")
    {
      warn!(
        coordinate = %node.coordinate,
        "maven.compiler.executable is set without maven.compiler.fork; set maven.compiler.fork (recommended: true)"
      );
    }

    Ok(node)
  }

  /// Records the version knowledge carried by a parent or dependency reference and returns its GA.
  fn register_reference(
    &mut self,
    node: &mut ProjectNode,
    origin: &str,
    reference: &RawReference<'_>,
  ) -> Result<Ga, ProjectError> {
    let group = self.expand(node, origin, reference.group)?;
    let artifact = self.expand(node, origin, reference.artifact)?;
    let ga = Ga::new(&group, &artifact);

    let version = match reference.version {
      Some(raw) => self.expand(node, origin, raw)?,
      None => return Ok(ga),
    };
    let Some(version) = pinned_version(&version) else {
      trace!(ga = %ga, version = %version, "reference carries no usable version");
      return Ok(ga);
    };

    let coordinate = Coordinate::new(group, artifact, version);
    let resolver: Rc<dyn CoordinateResolver> = Rc::new(PinnedResolver::new(coordinate.clone()));
    node.resolvers.insert(ga.clone(), resolver);

    if let (Some(dir), Some(relative)) = (node.source_dir.clone(), reference.relative_path)
      && !self.by_coordinate.contains_key(&coordinate)
    {
      let relative = self.expand(node, origin, relative)?;
      if !relative.is_empty() {
        self.load_source(&dir.join(relative))?;
      }
    }

    Ok(ga)
  }

  fn expand(&self, node: &ProjectNode, origin: &str, text: &str) -> Result<String, DescriptorError> {
    self
      .properties
      .template(Some(&node.scope()), text)
      .map_err(|source| DescriptorError::Property {
        origin: origin.to_string(),
        source,
      })
  }
}

impl ProjectSource for ProjectRegistry {
  fn project(&mut self, coordinate: &Coordinate) -> Result<Rc<ProjectNode>, ProjectError> {
    if let Some(node) = self.by_coordinate.get(coordinate) {
      return Ok(Rc::clone(node));
    }
    let path = self.store.materialize(coordinate, ArtifactKind::Descriptor)?;
    let node = self.load_repository(&path)?;
    if &node.coordinate != coordinate {
      warn!(requested = %coordinate, found = %node.coordinate, "descriptor declares a different coordinate");
      self.by_coordinate.insert(coordinate.clone(), Rc::clone(&node));
    }
    Ok(node)
  }
}

/// Adds `from`'s entries without overriding what `into` already knows.
fn fold_resolvers(into: &mut BTreeMap<Ga, Rc<dyn CoordinateResolver>>, from: &BTreeMap<Ga, Rc<dyn CoordinateResolver>>) {
  for (ga, resolver) in from {
    into.entry(ga.clone()).or_insert_with(|| Rc::clone(resolver));
  }
}

/// Reduces a version reference to one concrete version.
///
/// `LATEST`, `RELEASE` and empty versions yield `None`. Ranges keep their first bound.
fn pinned_version(version: &str) -> Option<String> {
  if version == "LATEST" || version == "RELEASE" {
    return None;
  }
  let stripped: String = version.chars().filter(|c| !matches!(c, '[' | ']' | '(' | ')')).collect();
  let first = stripped.split(',').next().unwrap_or_default().trim();
  if first.is_empty() { None } else { Some(first.to_string()) }
}
