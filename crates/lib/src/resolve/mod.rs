//! Dependency closure resolution.
//!
//! Versions are discovered while walking the graph: a GA may be referenced by
//! one project while the version for it is only declared by another project
//! reached later. Resolution therefore runs in passes. Each pass integrates
//! newly confirmed projects (their resolver maps and the GAs they need), then
//! resolves every pooled GA for which some resolver has been seen. The first
//! resolver seen for a GA wins, which makes the declaration nearest to the
//! root decide its version.
//!
//! A pass that neither learns a resolver, pools a GA, nor confirms a project
//! while work remains is a stall, and resolution fails naming the pool.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::fmt;
use std::rc::Rc;

use thiserror::Error;
use tracing::{debug, trace};

use crate::project::{Coordinate, DepSet, Ga, ProjectError, ProjectNode};

/// Something that can produce the node for a concrete coordinate.
pub trait ProjectSource {
  fn project(&mut self, coordinate: &Coordinate) -> Result<Rc<ProjectNode>, ProjectError>;
}

/// A deferred version decision for one GA.
pub trait CoordinateResolver: fmt::Debug {
  fn resolve(&self, source: &mut dyn ProjectSource) -> Result<Rc<ProjectNode>, ProjectError>;
}

/// Resolves to one fixed coordinate.
#[derive(Clone, PartialEq, Eq)]
pub struct PinnedResolver {
  coordinate: Coordinate,
}

impl PinnedResolver {
  pub fn new(coordinate: Coordinate) -> Self {
    Self { coordinate }
  }

  pub fn coordinate(&self) -> &Coordinate {
    &self.coordinate
  }
}

impl fmt::Debug for PinnedResolver {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "PinnedResolver({})", self.coordinate)
  }
}

impl CoordinateResolver for PinnedResolver {
  fn resolve(&self, source: &mut dyn ProjectSource) -> Result<Rc<ProjectNode>, ProjectError> {
    source.project(&self.coordinate)
  }
}

/// Errors from closure resolution.
#[derive(Debug, Error)]
pub enum ResolveError {
  /// No pass made progress while GAs remained unresolved.
  #[error("could not resolve dependencies of {root}: [{}]", join_gas(.unresolved))]
  Stall { root: Coordinate, unresolved: Vec<Ga> },

  /// A resolver failed to produce its project.
  #[error("resolving {ga}: {source}")]
  Project {
    ga: Ga,
    #[source]
    source: ProjectError,
  },
}

fn join_gas(gas: &[Ga]) -> String {
  gas.iter().map(Ga::as_str).collect::<Vec<_>>().join(", ")
}

/// A flattened, version-resolved dependency set, ordered by GA.
#[derive(Debug, Clone, Default)]
pub struct ResolvedClosure {
  nodes: BTreeMap<Ga, Rc<ProjectNode>>,
}

impl ResolvedClosure {
  pub fn get(&self, ga: &Ga) -> Option<&Rc<ProjectNode>> {
    self.nodes.get(ga)
  }

  pub fn contains(&self, ga: &Ga) -> bool {
    self.nodes.contains_key(ga)
  }

  pub fn len(&self) -> usize {
    self.nodes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.nodes.is_empty()
  }

  /// Entries in GA order.
  pub fn iter(&self) -> impl Iterator<Item = (&Ga, &Rc<ProjectNode>)> {
    self.nodes.iter()
  }

  pub fn nodes(&self) -> impl Iterator<Item = &Rc<ProjectNode>> {
    self.nodes.values()
  }

  /// Nodes sorted by full coordinate.
  pub fn by_coordinate(&self) -> Vec<Rc<ProjectNode>> {
    let mut nodes: Vec<Rc<ProjectNode>> = self.nodes.values().cloned().collect();
    nodes.sort_by(|a, b| a.coordinate.cmp(&b.coordinate));
    nodes
  }
}

/// Walks a dependency graph from a root project.
pub struct ClosureResolver<'s> {
  source: &'s mut dyn ProjectSource,
}

impl<'s> ClosureResolver<'s> {
  pub fn new(source: &'s mut dyn ProjectSource) -> Self {
    Self { source }
  }

  /// Resolves `set` of `root` (and the transitive view of everything it reaches).
  pub fn resolve(&mut self, root: &Rc<ProjectNode>, set: DepSet) -> Result<ResolvedClosure, ResolveError> {
    debug!(root = %root.coordinate, set = %set, "resolving dependencies");

    let mut seen: HashMap<Ga, Rc<dyn CoordinateResolver>> = HashMap::new();
    let mut confirmed: BTreeMap<Ga, Rc<ProjectNode>> = BTreeMap::new();
    let mut queue: VecDeque<Rc<ProjectNode>> = VecDeque::new();
    let mut pool: Vec<Ga> = Vec::new();
    let mut entered: HashSet<Ga> = HashSet::new();

    confirmed.insert(root.ga(), Rc::clone(root));
    queue.push_back(Rc::clone(root));

    let mut pass = 0usize;
    loop {
      pass += 1;
      let mut activity = false;

      while let Some(node) = queue.pop_front() {
        for (ga, resolver) in &node.resolvers {
          if !seen.contains_key(ga) {
            seen.insert(ga.clone(), Rc::clone(resolver));
            activity = true;
          }
        }
        let view = if Rc::ptr_eq(&node, root) { set } else { set.transitive() };
        for ga in node.dependencies.get(view) {
          if entered.insert(ga.clone()) {
            pool.push(ga.clone());
            activity = true;
          }
        }
      }

      for ga in &pool {
        if confirmed.contains_key(ga) {
          continue;
        }
        let Some(resolver) = seen.get(ga) else {
          continue;
        };
        let node = resolver.resolve(&mut *self.source).map_err(|source| ResolveError::Project {
          ga: ga.clone(),
          source,
        })?;
        trace!(ga = %ga, coordinate = %node.coordinate, pass, "confirmed");
        queue.push_back(Rc::clone(&node));
        confirmed.insert(ga.clone(), node);
        activity = true;
      }

      let before = pool.len();
      pool.retain(|ga| !confirmed.contains_key(ga));
      activity |= pool.len() != before;

      if pool.is_empty() && queue.is_empty() {
        break;
      }
      if !activity {
        return Err(ResolveError::Stall {
          root: root.coordinate.clone(),
          unresolved: pool,
        });
      }
    }

    debug!(root = %root.coordinate, set = %set, count = confirmed.len(), passes = pass, "dependencies resolved");
    Ok(ResolvedClosure { nodes: confirmed })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::project::Scope;

  /// In-memory graph keyed by coordinate.
  #[derive(Default)]
  struct Graph {
    nodes: HashMap<Coordinate, Rc<ProjectNode>>,
    loads: Vec<Coordinate>,
  }

  impl Graph {
    fn add(&mut self, node: ProjectNode) -> Rc<ProjectNode> {
      let node = Rc::new(node);
      self.nodes.insert(node.coordinate.clone(), Rc::clone(&node));
      node
    }
  }

  impl ProjectSource for Graph {
    fn project(&mut self, coordinate: &Coordinate) -> Result<Rc<ProjectNode>, ProjectError> {
      self.loads.push(coordinate.clone());
      self
        .nodes
        .get(coordinate)
        .cloned()
        .ok_or_else(|| ProjectError::InvalidCoordinate(coordinate.to_string()))
    }
  }

  fn coord(s: &str) -> Coordinate {
    s.parse().unwrap()
  }

  /// Declares a dependency on `triple` (or an unversioned `g:a`) with the given scope.
  fn depend(node: &mut ProjectNode, reference: &str, scope: Scope) {
    let parts: Vec<&str> = reference.split(':').collect();
    let ga = Ga::new(parts[0], parts[1]);
    if parts.len() == 3 {
      let resolver: Rc<dyn CoordinateResolver> = Rc::new(PinnedResolver::new(coord(reference)));
      node.resolvers.insert(ga.clone(), resolver);
    }
    node.dependencies.declare(&ga, scope, false);
  }

  fn triples(closure: &ResolvedClosure) -> Vec<String> {
    closure.nodes().map(|n| n.coordinate.to_string()).collect()
  }

  #[test]
  fn transitive_dependency_declared_by_intermediate() {
    let mut graph = Graph::default();
    graph.add(ProjectNode::new(coord("g:b:1.0")));
    let mut a = ProjectNode::new(coord("g:a:1.0"));
    depend(&mut a, "g:b:1.0", Scope::Compile);
    graph.add(a);
    let mut root = ProjectNode::new(coord("g:root:1.0"));
    depend(&mut root, "g:a:1.0", Scope::Compile);
    let root = graph.add(root);

    let closure = ClosureResolver::new(&mut graph).resolve(&root, DepSet::RootMainCompile).unwrap();
    assert_eq!(triples(&closure), vec!["g:a:1.0", "g:b:1.0", "g:root:1.0"]);
  }

  #[test]
  fn nearest_declaration_wins() {
    let mut graph = Graph::default();
    graph.add(ProjectNode::new(coord("g:a:1.0")));
    graph.add(ProjectNode::new(coord("g:a:2.0")));
    let mut b = ProjectNode::new(coord("g:b:1.0"));
    depend(&mut b, "g:a:2.0", Scope::Compile);
    graph.add(b);
    let mut root = ProjectNode::new(coord("g:root:1.0"));
    depend(&mut root, "g:a:1.0", Scope::Compile);
    depend(&mut root, "g:b:1.0", Scope::Compile);
    let root = graph.add(root);

    let closure = ClosureResolver::new(&mut graph).resolve(&root, DepSet::RootMainCompile).unwrap();
    let a = closure.get(&Ga::new("g", "a")).unwrap();
    assert_eq!(a.coordinate.version, "1.0");
    assert!(!graph.loads.contains(&coord("g:a:2.0")));
  }

  #[test]
  fn nearest_wins_over_deeper_chain() {
    // root -> b -> c -> a@3.0, root -> d -> a@2.0: d is closer, so 2.0.
    let mut graph = Graph::default();
    graph.add(ProjectNode::new(coord("g:a:2.0")));
    graph.add(ProjectNode::new(coord("g:a:3.0")));
    let mut c = ProjectNode::new(coord("g:c:1.0"));
    depend(&mut c, "g:a:3.0", Scope::Compile);
    graph.add(c);
    let mut b = ProjectNode::new(coord("g:b:1.0"));
    depend(&mut b, "g:c:1.0", Scope::Compile);
    graph.add(b);
    let mut d = ProjectNode::new(coord("g:d:1.0"));
    depend(&mut d, "g:a:2.0", Scope::Compile);
    graph.add(d);
    let mut root = ProjectNode::new(coord("g:root:1.0"));
    depend(&mut root, "g:b:1.0", Scope::Compile);
    depend(&mut root, "g:d:1.0", Scope::Compile);
    let root = graph.add(root);

    let closure = ClosureResolver::new(&mut graph).resolve(&root, DepSet::RootMainCompile).unwrap();
    assert_eq!(closure.get(&Ga::new("g", "a")).unwrap().coordinate.version, "2.0");
  }

  #[test]
  fn forward_reference_resolves_in_later_pass() {
    // root needs x without a version; only sibling s (reached in the same pass) declares it.
    let mut graph = Graph::default();
    graph.add(ProjectNode::new(coord("g:x:4.0")));
    let mut s = ProjectNode::new(coord("g:s:1.0"));
    depend(&mut s, "g:x:4.0", Scope::Provided);
    graph.add(s);
    let mut root = ProjectNode::new(coord("g:root:1.0"));
    depend(&mut root, "g:x", Scope::Compile);
    depend(&mut root, "g:s:1.0", Scope::Compile);
    let root = graph.add(root);

    let closure = ClosureResolver::new(&mut graph).resolve(&root, DepSet::RootMainCompile).unwrap();
    assert_eq!(closure.get(&Ga::new("g", "x")).unwrap().coordinate.version, "4.0");
  }

  #[test]
  fn unversioned_reference_stalls_naming_exactly_that_ga() {
    let mut graph = Graph::default();
    let mut a = ProjectNode::new(coord("g:a:1.0"));
    depend(&mut a, "g:ghost", Scope::Compile);
    graph.add(a);
    let mut root = ProjectNode::new(coord("g:root:1.0"));
    depend(&mut root, "g:a:1.0", Scope::Compile);
    let root = graph.add(root);

    let err = ClosureResolver::new(&mut graph)
      .resolve(&root, DepSet::RootMainCompile)
      .unwrap_err();
    match err {
      ResolveError::Stall { root, unresolved } => {
        assert_eq!(root, coord("g:root:1.0"));
        assert_eq!(unresolved, vec![Ga::new("g", "ghost")]);
      }
      other => panic!("expected stall, got {other:?}"),
    }
  }

  #[test]
  fn stall_message_lists_pool() {
    let mut graph = Graph::default();
    let mut root = ProjectNode::new(coord("g:root:1.0"));
    depend(&mut root, "g:ghost", Scope::Compile);
    let root = graph.add(root);
    let err = ClosureResolver::new(&mut graph)
      .resolve(&root, DepSet::RootMainCompile)
      .unwrap_err();
    assert_eq!(err.to_string(), "could not resolve dependencies of g:root:1.0: [g:ghost]");
  }

  #[test]
  fn optional_dependencies_are_not_transitive() {
    let mut graph = Graph::default();
    graph.add(ProjectNode::new(coord("g:opt:1.0")));
    let mut a = ProjectNode::new(coord("g:a:1.0"));
    let opt = Ga::new("g", "opt");
    let resolver: Rc<dyn CoordinateResolver> = Rc::new(PinnedResolver::new(coord("g:opt:1.0")));
    a.resolvers.insert(opt.clone(), resolver);
    a.dependencies.declare(&opt, Scope::Compile, true);
    graph.add(a);
    let mut root = ProjectNode::new(coord("g:root:1.0"));
    depend(&mut root, "g:a:1.0", Scope::Compile);
    let root = graph.add(root);

    let closure = ClosureResolver::new(&mut graph).resolve(&root, DepSet::RootMainCompile).unwrap();
    assert!(!closure.contains(&opt));
  }

  #[test]
  fn test_scope_does_not_leak_into_compile_closure() {
    let mut graph = Graph::default();
    graph.add(ProjectNode::new(coord("junit:junit:4.13")));
    let mut root = ProjectNode::new(coord("g:root:1.0"));
    depend(&mut root, "junit:junit:4.13", Scope::Test);
    let root = graph.add(root);

    let mut resolver = ClosureResolver::new(&mut graph);
    assert_eq!(resolver.resolve(&root, DepSet::RootMainCompile).unwrap().len(), 1);
    assert_eq!(resolver.resolve(&root, DepSet::RootTest).unwrap().len(), 2);
  }

  #[test]
  fn dependency_cycle_terminates() {
    let mut graph = Graph::default();
    let mut a = ProjectNode::new(coord("g:a:1.0"));
    depend(&mut a, "g:root:1.0", Scope::Compile);
    graph.add(a);
    let mut root = ProjectNode::new(coord("g:root:1.0"));
    depend(&mut root, "g:a:1.0", Scope::Compile);
    let root = graph.add(root);

    let closure = ClosureResolver::new(&mut graph).resolve(&root, DepSet::RootMainCompile).unwrap();
    assert_eq!(triples(&closure), vec!["g:a:1.0", "g:root:1.0"]);
  }

  #[test]
  fn repeated_resolution_is_identical() {
    let mut graph = Graph::default();
    for name in ["c", "b", "a"] {
      graph.add(ProjectNode::new(coord(&format!("g:{name}:1.0"))));
    }
    let mut root = ProjectNode::new(coord("g:root:1.0"));
    for name in ["c", "a", "b"] {
      depend(&mut root, &format!("g:{name}:1.0"), Scope::Runtime);
    }
    let root = graph.add(root);

    let mut resolver = ClosureResolver::new(&mut graph);
    let first = triples(&resolver.resolve(&root, DepSet::RootMainRuntime).unwrap());
    let second = triples(&resolver.resolve(&root, DepSet::RootMainRuntime).unwrap());
    assert_eq!(first, second);
    assert_eq!(first, vec!["g:a:1.0", "g:b:1.0", "g:c:1.0", "g:root:1.0"]);
  }

  #[test]
  fn resolver_failure_names_the_ga() {
    let mut graph = Graph::default();
    let mut root = ProjectNode::new(coord("g:root:1.0"));
    depend(&mut root, "g:missing:1.0", Scope::Compile);
    let root = graph.add(root);
    let err = ClosureResolver::new(&mut graph)
      .resolve(&root, DepSet::RootMainCompile)
      .unwrap_err();
    assert!(matches!(err, ResolveError::Project { ref ga, .. } if ga == &Ga::new("g", "missing")));
  }
}
