//! `moorage tree` command

use std::collections::{BTreeSet, HashSet};

use anyhow::Result;

use crate::cli::{GlobalArgs, TreeArgs};
use moorage::util::shell::Status;
use moorage::util::GlobalContext;
use moorage::WorkspaceGraph;

pub fn execute(args: TreeArgs, global: &GlobalArgs) -> Result<()> {
    let shell = global.shell(false);
    let ctx = GlobalContext::new()?;
    let ws = ctx.workspace()?;
    let graph = WorkspaceGraph::build(&ws)?;

    let roots: Vec<String> = match &args.package {
        Some(name) => {
            ws.package(name)?;
            vec![name.clone()]
        }
        None => top_level(&graph, args.invert),
    };

    if args.order {
        return print_order(&graph, args.package.as_deref());
    }

    let max_depth = args.depth.unwrap_or(usize::MAX);
    for root in &roots {
        let mut seen = HashSet::new();
        print_tree(&graph, root, 0, max_depth, &mut seen, args.invert);
    }

    for cycle in graph.cycles() {
        shell.status(Status::Warning, format!("dependency cycle between {}", cycle.join(", ")));
    }

    Ok(())
}

/// One package per line, dependencies first. Limited to `package` and its
/// transitive dependencies when given. A cycle makes the order undefined.
fn print_order(graph: &WorkspaceGraph, package: Option<&str>) -> Result<()> {
    let order = graph.build_order()?;
    let keep = package.map(|name| {
        let mut keep = graph.closure(name);
        keep.insert(name.to_string());
        keep
    });

    for name in order {
        if keep.as_ref().map_or(true, |keep| keep.contains(&name)) {
            println!("{}", name);
        }
    }
    Ok(())
}

/// Packages nothing points at; every package if the graph is one big cycle.
fn top_level(graph: &WorkspaceGraph, invert: bool) -> Vec<String> {
    let edges = |name: &str| -> BTreeSet<String> {
        if invert {
            graph.deps(name)
        } else {
            graph.dependents(name)
        }
    };

    let roots: Vec<String> = graph
        .packages()
        .filter(|name| edges(*name).is_empty())
        .map(str::to_string)
        .collect();

    if roots.is_empty() {
        graph.packages().map(str::to_string).collect()
    } else {
        roots
    }
}

fn print_tree(
    graph: &WorkspaceGraph,
    name: &str,
    depth: usize,
    max_depth: usize,
    seen: &mut HashSet<String>,
    invert: bool,
) {
    if depth > max_depth {
        return;
    }

    let is_duplicate = !seen.insert(name.to_string());

    let prefix = if depth == 0 {
        String::new()
    } else {
        format!("{}├── ", "│   ".repeat(depth - 1))
    };
    let dup_marker = if is_duplicate { " (*)" } else { "" };

    println!("{}{}{}", prefix, name, dup_marker);

    // Don't recurse into duplicates
    if is_duplicate {
        return;
    }

    let children = if invert {
        graph.dependents(name)
    } else {
        graph.deps(name)
    };
    for child in &children {
        print_tree(graph, child, depth + 1, max_depth, seen, invert);
    }
}
