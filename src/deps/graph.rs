//! Workspace dependency graph.
//!
//! A package's sibling dependencies are derived purely from its sources:
//! every extracted specifier that is not relative and sits under the
//! workspace alias prefix names a sibling package. The whole-workspace graph
//! is recomputed from scratch on every call.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use anyhow::{Context, Result};
use petgraph::algo::{tarjan_scc, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use rayon::prelude::*;
use thiserror::Error;
use tracing::debug;

use crate::core::Workspace;
use crate::deps::extract::{ReferenceMention, SpecifierExtractor};
use crate::deps::walker::{collect_files, WalkOptions};

/// Errors from whole-graph queries.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("dependency cycle between packages: {}", packages.join(" -> "))]
    Cycle { packages: Vec<String> },
}

/// How a specifier relates to the workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpecifierKind {
    /// `.`, `..`, `./x`, `../x`.
    Relative,
    /// `{prefix}/{package}[/...]`.
    Workspace(String),
    /// Anything else: third-party libraries and builtins.
    External,
}

/// Whether `p` is a relative path in the module-specifier sense.
///
/// Backslash separators only count on Windows.
pub fn is_relative_path(p: &str) -> bool {
    let bytes = p.as_bytes();
    let is_sep = |b: u8| b == b'/' || (cfg!(windows) && b == b'\\');

    match bytes {
        [b'.'] => true,
        [b'.', b'.'] => true,
        [b'.', b'.', c, ..] => is_sep(*c),
        [b'.', c, ..] => is_sep(*c),
        _ => false,
    }
}

/// Classify `specifier` against the workspace alias `prefix`.
pub fn classify(prefix: &str, specifier: &str) -> SpecifierKind {
    if is_relative_path(specifier) {
        return SpecifierKind::Relative;
    }

    let package = specifier
        .strip_prefix(prefix)
        .and_then(|rest| rest.strip_prefix('/'))
        .and_then(|rest| rest.split('/').next())
        .filter(|name| !name.is_empty());

    match package {
        Some(name) => SpecifierKind::Workspace(name.to_string()),
        None => SpecifierKind::External,
    }
}

fn walk_options(ws: &Workspace) -> WalkOptions {
    WalkOptions::new(ws.config().source_extensions(), ws.config().scan_exclude())
}

/// Every mention in `package`'s sources, in file order.
///
/// A package without a source root has no mentions.
pub fn mentions(ws: &Workspace, package: &str) -> Result<Vec<ReferenceMention>> {
    let source_root = ws.source_root(package);
    if !source_root.is_dir() {
        debug!("{} has no source root at {}", package, source_root.display());
        return Ok(Vec::new());
    }

    let files = collect_files(&source_root, &walk_options(ws))
        .with_context(|| format!("failed to scan sources of `{}`", package))?;
    debug!("scanning {} files of {}", files.len(), package);

    let per_file: Vec<Vec<ReferenceMention>> = files
        .par_iter()
        .map_init(SpecifierExtractor::new, |extractor, file| match extractor {
            Ok(extractor) => Ok(extractor.extract(&file.path, &file.contents)),
            Err(e) => Err(anyhow::anyhow!("{:#}", e)),
        })
        .collect::<Result<_>>()?;

    Ok(per_file.into_iter().flatten().collect())
}

/// Direct sibling dependencies of `package`.
///
/// Self references and names that are not current sibling directories are
/// dropped.
pub fn compute_deps(ws: &Workspace, package: &str) -> Result<BTreeSet<String>> {
    let siblings: BTreeSet<String> = ws.package_names()?.into_iter().collect();
    let found = mentions(ws, package)?;

    let deps: BTreeSet<String> = found
        .iter()
        .filter_map(|m| match classify(ws.prefix(), &m.specifier) {
            SpecifierKind::Workspace(name) => Some(name),
            _ => None,
        })
        .filter(|name| name != package && siblings.contains(name))
        .collect();

    debug!("{} depends on {:?}", package, deps);
    Ok(deps)
}

/// Dependency graph of every current package.
#[derive(Debug, Clone)]
pub struct WorkspaceGraph {
    /// Edges point from a package to the packages it depends on.
    graph: DiGraph<String, ()>,
    nodes: HashMap<String, NodeIndex>,
    deps: BTreeMap<String, BTreeSet<String>>,
}

impl WorkspaceGraph {
    /// Scan every package in parallel and assemble the graph.
    pub fn build(ws: &Workspace) -> Result<Self> {
        let names = ws.package_names()?;

        let computed: Vec<(String, BTreeSet<String>)> = names
            .par_iter()
            .map(|name| compute_deps(ws, name).map(|deps| (name.clone(), deps)))
            .collect::<Result<_>>()?;

        Ok(Self::from_deps(computed.into_iter().collect()))
    }

    /// Assemble a graph from precomputed direct dependencies.
    pub fn from_deps(deps: BTreeMap<String, BTreeSet<String>>) -> Self {
        let mut graph = DiGraph::new();
        let mut nodes = HashMap::new();

        for name in deps.keys() {
            nodes.insert(name.clone(), graph.add_node(name.clone()));
        }
        for (name, targets) in &deps {
            for target in targets {
                if let (Some(&from), Some(&to)) = (nodes.get(name), nodes.get(target)) {
                    graph.add_edge(from, to, ());
                }
            }
        }

        WorkspaceGraph { graph, nodes, deps }
    }

    /// Package names, sorted.
    pub fn packages(&self) -> impl Iterator<Item = &str> {
        self.deps.keys().map(String::as_str)
    }

    /// Direct dependencies of `package`.
    pub fn deps(&self, package: &str) -> BTreeSet<String> {
        self.deps.get(package).cloned().unwrap_or_default()
    }

    /// Packages that depend directly on `package`.
    pub fn dependents(&self, package: &str) -> BTreeSet<String> {
        match self.nodes.get(package) {
            Some(&node) => self
                .graph
                .neighbors_directed(node, Direction::Incoming)
                .map(|n| self.graph[n].clone())
                .collect(),
            None => BTreeSet::new(),
        }
    }

    /// Transitive dependencies of `package`, excluding itself.
    pub fn closure(&self, package: &str) -> BTreeSet<String> {
        let mut visited = BTreeSet::new();
        let mut stack: Vec<String> = self.deps(package).into_iter().collect();

        while let Some(current) = stack.pop() {
            if visited.insert(current.clone()) {
                stack.extend(self.deps(&current));
            }
        }

        visited.remove(package);
        visited
    }

    /// Strongly connected groups of two or more packages, each sorted.
    pub fn cycles(&self) -> Vec<Vec<String>> {
        let mut cycles: Vec<Vec<String>> = tarjan_scc(&self.graph)
            .into_iter()
            .filter(|component| component.len() > 1)
            .map(|component| {
                let mut names: Vec<String> =
                    component.into_iter().map(|n| self.graph[n].clone()).collect();
                names.sort();
                names
            })
            .collect();
        cycles.sort();
        cycles
    }

    /// Packages with dependencies before dependents.
    pub fn build_order(&self) -> Result<Vec<String>, GraphError> {
        match toposort(&self.graph, None) {
            Ok(order) => Ok(order
                .into_iter()
                .rev()
                .map(|n| self.graph[n].clone())
                .collect()),
            Err(_) => Err(GraphError::Cycle {
                packages: self.cycles().into_iter().next().unwrap_or_default(),
            }),
        }
    }
}
