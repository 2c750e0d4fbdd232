//! Project reference synchronization.
//!
//! Keeps each package descriptor's `references` equal to the sibling
//! packages its sources actually import. A descriptor is written only when
//! the sorted computed list differs from the sorted stored one.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::core::{DescriptorError, Workspace};
use crate::deps::compute_deps;

/// Whether a pass writes descriptors or only reports drift.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncMode {
    #[default]
    Write,
    Check,
}

/// Result of synchronizing one package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOutcome {
    pub package: String,
    pub deps: BTreeSet<String>,
    /// Stored references differed from the computed ones.
    pub changed: bool,
}

/// Result of a whole-workspace pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub updated: Vec<String>,
    pub unchanged: Vec<String>,
    /// Packages whose descriptor could not be used, with the reason.
    pub skipped: Vec<(String, String)>,
}

impl SyncReport {
    pub fn is_clean(&self) -> bool {
        self.updated.is_empty()
    }
}

/// Descriptor-relative path of a sibling's descriptor.
pub fn reference_path(ws: &Workspace, dep: &str) -> String {
    format!("../{}/{}", dep, ws.config().descriptor_name())
}

/// Synchronize the references of one package.
pub fn sync_package(ws: &Workspace, name: &str) -> Result<SyncOutcome> {
    sync_package_with(ws, name, SyncMode::Write)
}

/// Synchronize one package, writing only in [`SyncMode::Write`].
pub fn sync_package_with(ws: &Workspace, name: &str, mode: SyncMode) -> Result<SyncOutcome> {
    let package = ws.package(name)?;
    let mut document = package.load_descriptor()?;

    let deps = compute_deps(ws, name)?;
    let paths: Vec<String> = deps.iter().map(|dep| reference_path(ws, dep)).collect();

    let changed = document.set_references(paths);
    if changed && mode == SyncMode::Write {
        document.save()?;
        debug!("wrote references of {}: {:?}", name, deps);
    } else {
        debug!("references of {} are up to date", name);
    }

    Ok(SyncOutcome {
        package: name.to_string(),
        deps,
        changed,
    })
}

/// Synchronize every current package once, in sorted order.
///
/// Descriptor problems skip the package; scan errors abort the pass.
pub fn update_references(ws: &Workspace) -> Result<SyncReport> {
    reconcile_all(ws, SyncMode::Write)
}

/// Like [`update_references`] but never writes.
pub fn check_references(ws: &Workspace) -> Result<SyncReport> {
    reconcile_all(ws, SyncMode::Check)
}

fn reconcile_all(ws: &Workspace, mode: SyncMode) -> Result<SyncReport> {
    let mut report = SyncReport::default();

    for name in ws.package_names()? {
        match sync_package_with(ws, &name, mode) {
            Ok(outcome) if outcome.changed => report.updated.push(name),
            Ok(_) => report.unchanged.push(name),
            Err(e) if e.downcast_ref::<DescriptorError>().is_some() => {
                warn!("skipping {}: {:#}", name, e);
                report.skipped.push((name, format!("{:#}", e)));
            }
            Err(e) => return Err(e),
        }
    }

    info!(
        "references: {} updated, {} unchanged, {} skipped",
        report.updated.len(),
        report.unchanged.len(),
        report.skipped.len()
    );
    Ok(report)
}

/// Result of a deep pass from one package.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeepSyncReport {
    /// Every synchronized package with its direct dependencies.
    pub visited: BTreeMap<String, BTreeSet<String>>,
    /// Packages whose descriptor could not be used, with the reason.
    pub skipped: Vec<(String, String)>,
}

/// Synchronize `start` and, recursively, every package it depends on.
///
/// Each package is visited at most once; it is marked before its
/// dependencies are visited, so cycles terminate. A dependency with an
/// unusable descriptor is skipped and the rest of the walk continues.
pub fn update_references_deep(ws: &Workspace, start: &str) -> Result<DeepSyncReport> {
    let mut updated = HashSet::new();
    let mut report = DeepSyncReport::default();
    sync_deep(ws, start, &mut updated, &mut report)?;
    Ok(report)
}

fn sync_deep(
    ws: &Workspace,
    name: &str,
    updated: &mut HashSet<String>,
    report: &mut DeepSyncReport,
) -> Result<()> {
    updated.insert(name.to_string());
    let outcome = match sync_package(ws, name) {
        Ok(outcome) => outcome,
        Err(e) if e.downcast_ref::<DescriptorError>().is_some() => {
            warn!("skipping {}: {:#}", name, e);
            report.skipped.push((name.to_string(), format!("{:#}", e)));
            return Ok(());
        }
        Err(e) => return Err(e),
    };

    for dep in &outcome.deps {
        if !updated.contains(dep) {
            sync_deep(ws, dep, updated, report)?;
        }
    }

    report.visited.insert(outcome.package, outcome.deps);
    Ok(())
}
