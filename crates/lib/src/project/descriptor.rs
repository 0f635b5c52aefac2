//! Reading `pom.xml` documents.
//!
//! The XML is parsed once into an owned [`XmlElement`] tree; [`Descriptor`]
//! then exposes the raw, untemplated pieces the loader needs. Element names are
//! matched by local part, so documents declaring the POM namespace work too.

use sxd_document::dom::{ChildOfElement, ChildOfRoot, Element};
use sxd_document::parser;

use crate::project::types::DescriptorError;

/// Owned copy of one XML element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlElement {
  pub name: String,
  /// Concatenated text of this element and all descendants, in document order.
  pub text: String,
  pub children: Vec<XmlElement>,
}

impl XmlElement {
  fn from_dom(element: Element<'_>) -> Self {
    let mut children = Vec::new();
    let mut text = String::new();
    for child in element.children() {
      match child {
        ChildOfElement::Element(inner) => {
          let inner = XmlElement::from_dom(inner);
          text.push_str(&inner.text);
          children.push(inner);
        }
        ChildOfElement::Text(t) => text.push_str(t.text()),
        _ => {}
      }
    }
    Self {
      name: element.name().local_part().to_string(),
      text,
      children,
    }
  }

  /// First direct child with the given name.
  pub fn child(&self, name: &str) -> Option<&XmlElement> {
    self.children.iter().find(|c| c.name == name)
  }

  /// Direct children with the given name, in document order.
  pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlElement> + 'a {
    self.children.iter().filter(move |c| c.name == name)
  }

  /// Text of the first direct child with the given name.
  pub fn child_text(&self, name: &str) -> Option<&str> {
    self.child(name).map(|c| c.text.as_str())
  }

  /// Depth-first search below this element; the first match wins.
  pub fn find_descendant(&self, name: &str) -> Option<&XmlElement> {
    for child in &self.children {
      if child.name == name {
        return Some(child);
      }
      if let Some(found) = child.find_descendant(name) {
        return Some(found);
      }
    }
    None
  }

  /// Every descendant with the given name, in document order.
  pub fn descendants_named<'a>(&'a self, name: &str, out: &mut Vec<&'a XmlElement>) {
    for child in &self.children {
      if child.name == name {
        out.push(child);
      }
      child.descendants_named(name, out);
    }
  }
}

/// A reference to another project, as written in `<parent>` or `<dependency>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawReference<'a> {
  pub group: &'a str,
  pub artifact: &'a str,
  pub version: Option<&'a str>,
  pub relative_path: Option<&'a str>,
}

/// One `<dependency>` entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawDependency<'a> {
  pub reference: RawReference<'a>,
  pub scope: Option<&'a str>,
  pub optional: Option<&'a str>,
}

/// Elements under `<project>` bound to `project.*` properties.
const BOUND_PROPERTIES: &[&str] = &[
  "groupId",
  "artifactId",
  "version",
  "packaging",
  "build.sourceEncoding",
  "build.sourceDirectory",
  "build.testSourceDirectory",
  "build.resources.resource.directory",
  "build.testResources.testResource.directory",
];

/// A parsed project descriptor. All strings are raw, before templating.
#[derive(Debug, Clone)]
pub struct Descriptor {
  origin: String,
  project: XmlElement,
}

impl Descriptor {
  /// Parses descriptor bytes. `origin` names the source in error messages.
  pub fn parse(bytes: &[u8], origin: &str) -> Result<Self, DescriptorError> {
    let malformed = |message: String| DescriptorError::Malformed {
      origin: origin.to_string(),
      message,
    };

    let text = std::str::from_utf8(bytes).map_err(|e| malformed(e.to_string()))?;
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let package = parser::parse(text).map_err(|e| malformed(format!("{:?}", e)))?;
    let document = package.as_document();

    let root = document
      .root()
      .children()
      .into_iter()
      .find_map(|child| match child {
        ChildOfRoot::Element(element) => Some(XmlElement::from_dom(element)),
        _ => None,
      })
      .ok_or_else(|| malformed("no root element".to_string()))?;

    if root.name != "project" {
      return Err(DescriptorError::MissingElement {
        origin: origin.to_string(),
        element: "project".to_string(),
      });
    }

    Ok(Self {
      origin: origin.to_string(),
      project: root,
    })
  }

  pub fn origin(&self) -> &str {
    &self.origin
  }

  pub fn project(&self) -> &XmlElement {
    &self.project
  }

  /// Entries of `<properties>`, in document order.
  pub fn properties(&self) -> Vec<(&str, &str)> {
    self
      .project
      .child("properties")
      .map(|props| props.children.iter().map(|c| (c.name.as_str(), c.text.as_str())).collect())
      .unwrap_or_default()
  }

  /// Values of the `project.*` elements that are present, keyed by property name.
  pub fn bound_properties(&self) -> Vec<(String, &str)> {
    let mut out = Vec::new();
    for path in BOUND_PROPERTIES {
      let mut current = Some(&self.project);
      for part in path.split('.') {
        current = current.and_then(|el| el.child(part));
      }
      if let Some(el) = current {
        out.push((format!("project.{}", path), el.text.as_str()));
      }
    }
    out
  }

  pub fn parent(&self) -> Result<Option<RawReference<'_>>, DescriptorError> {
    match self.project.child("parent") {
      Some(el) => Ok(Some(self.reference(el)?)),
      None => Ok(None),
    }
  }

  /// `<repositories><repository><url>` values.
  pub fn repositories(&self) -> Vec<&str> {
    self
      .project
      .child("repositories")
      .map(|repos| {
        repos
          .children_named("repository")
          .filter_map(|r| r.child_text("url"))
          .collect()
      })
      .unwrap_or_default()
  }

  pub fn dependencies(&self) -> Result<Vec<RawDependency<'_>>, DescriptorError> {
    let Some(deps) = self.project.child("dependencies") else {
      return Ok(Vec::new());
    };
    deps
      .children_named("dependency")
      .map(|el| {
        Ok(RawDependency {
          reference: self.reference(el)?,
          scope: el.child_text("scope"),
          optional: el.child_text("optional"),
        })
      })
      .collect()
  }

  /// `<module>` entries anywhere below `<modules>`.
  pub fn modules(&self) -> Vec<&str> {
    let mut found = Vec::new();
    if let Some(modules) = self.project.child("modules") {
      modules.descendants_named("module", &mut found);
    }
    found.into_iter().map(|m| m.text.as_str()).collect()
  }

  fn plugins(&self) -> impl Iterator<Item = &XmlElement> {
    self
      .project
      .child("build")
      .and_then(|b| b.child("plugins"))
      .into_iter()
      .flat_map(|p| p.children_named("plugin"))
  }

  /// `manifest/mainClass` from the assembly or jar plugin configuration.
  pub fn main_class(&self) -> Option<&str> {
    self
      .plugins()
      .filter(|p| matches!(p.child_text("artifactId"), Some("maven-assembly-plugin" | "maven-jar-plugin")))
      .filter_map(|p| p.find_descendant("manifest"))
      .find_map(|m| m.child_text("mainClass"))
  }

  /// `compilerArgs/arg` values from the compiler plugin configuration.
  pub fn compiler_args(&self) -> Vec<&str> {
    let mut args = Vec::new();
    for plugin in self
      .plugins()
      .filter(|p| p.child_text("artifactId") == Some("maven-compiler-plugin"))
    {
      if let Some(list) = plugin.find_descendant("compilerArgs") {
        let mut found = Vec::new();
        list.descendants_named("arg", &mut found);
        args.extend(found.into_iter().map(|a| a.text.as_str()));
      }
    }
    args
  }

  fn reference<'a>(&'a self, el: &'a XmlElement) -> Result<RawReference<'a>, DescriptorError> {
    let required = |name: &str| {
      el.child_text(name).ok_or_else(|| DescriptorError::MissingElement {
        origin: self.origin.clone(),
        element: name.to_string(),
      })
    };
    Ok(RawReference {
      group: required("groupId")?,
      artifact: required("artifactId")?,
      version: el.child_text("version"),
      relative_path: el.child_text("relativePath"),
    })
  }
}
