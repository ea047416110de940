//! Bundle assignment resolution.
//!
//! Decides, for every object appearing in any bundle's closure, which single
//! bundle owns it, and derives the inter-bundle dependency graph. Closure
//! computation fans out across bundles; the ownership tie-break needs every
//! closure, so it runs after they all join. Per-bundle failures are
//! collected and reported together so one pass surfaces every misconfigured
//! bundle, while a dependency cycle or an ownerless object aborts the build
//! before any archival starts.

use crate::closure::closure_for_assets;
use pak_model::{
    AssetGraphSource, BundleAssignment, BundleDefinition, Guid, ObjectIdentifier, SourceError,
};
use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use thiserror::Error;

/// Who owns an object that no bundle lists explicitly.
///
/// Both choices are pure functions of the definition set, so repeated builds
/// of the same input produce the same assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OwnershipPolicy {
    /// The lexicographically first claiming bundle owns it.
    FirstClaimant,

    /// Objects claimed by two or more bundles are extracted into a
    /// synthesized bundle of the given name; sole-claimant objects still go
    /// to their claimant.
    SharedBundle { name: String },
}

impl Default for OwnershipPolicy {
    fn default() -> Self {
        OwnershipPolicy::FirstClaimant
    }
}

/// A single resolution failure.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("no bundle definitions")]
    NoBundles,

    #[error("duplicate bundle name '{0}'")]
    DuplicateBundleName(String),

    #[error("shared bundle name '{0}' collides with a defined bundle")]
    SharedNameCollision(String),

    #[error("bundle '{bundle}': {source}")]
    Bundle {
        bundle: String,
        source: SourceError,
    },

    #[error("cyclic bundle dependency: {}", .cycle.join(" -> "))]
    CyclicBundleDependency { cycle: Vec<String> },

    /// An object reached dependency wiring without an owner. Ownership is
    /// assigned to every closure member first, so this is a resolver bug,
    /// not a configuration error.
    #[error("object {object} has no owning bundle")]
    OrphanObject { object: ObjectIdentifier },
}

impl ResolveError {
    /// True for failures a lenient build can recover from by dropping the
    /// affected bundle.
    pub fn is_unresolved_asset(&self) -> bool {
        matches!(
            self,
            ResolveError::Bundle {
                source: SourceError::UnresolvedAsset(_),
                ..
            }
        )
    }

    /// Name of the bundle this failure is scoped to, if any.
    pub fn bundle_name(&self) -> Option<&str> {
        match self {
            ResolveError::Bundle { bundle, .. } => Some(bundle),
            _ => None,
        }
    }
}

/// Every resolution failure from one pass, reported together.
#[derive(Debug)]
pub struct ResolveErrors(pub Vec<ResolveError>);

impl fmt::Display for ResolveErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for error in &self.0 {
            if !first {
                write!(f, "; ")?;
            }
            write!(f, "{}", error)?;
            first = false;
        }
        Ok(())
    }
}

impl std::error::Error for ResolveErrors {}

/// Resolver output for one bundle: the assignment plus the byproducts the
/// command emitter needs, so emission stays a pure shape transform.
#[derive(Debug, Clone)]
pub struct ResolvedBundle {
    pub assignment: BundleAssignment,

    /// Direct object lists of each explicit asset, before traversal.
    pub explicit_objects: BTreeMap<Guid, Vec<ObjectIdentifier>>,

    /// Full closure: owned plus foreign.
    pub closure: BTreeSet<ObjectIdentifier>,

    pub editor_only: bool,
}

/// The complete build plan input: one resolved bundle per definition, plus
/// the synthesized shared bundle when the policy produced one. Sorted by
/// name.
#[derive(Debug, Clone)]
pub struct ResolvedBundles {
    pub bundles: Vec<ResolvedBundle>,
}

impl ResolvedBundles {
    pub fn get(&self, name: &str) -> Option<&ResolvedBundle> {
        self.bundles.iter().find(|b| b.assignment.name == name)
    }
}

/// Resolves ownership and inter-bundle dependencies for a definition set.
pub fn resolve_bundles<S: AssetGraphSource + ?Sized>(
    source: &S,
    definitions: &[BundleDefinition],
    policy: &OwnershipPolicy,
) -> Result<ResolvedBundles, ResolveErrors> {
    if definitions.is_empty() {
        return Err(ResolveErrors(vec![ResolveError::NoBundles]));
    }

    // Lexicographic name order is the deterministic order every tie-break
    // below leans on.
    let mut defs: Vec<&BundleDefinition> = definitions.iter().collect();
    defs.sort_by(|a, b| a.name.cmp(&b.name));

    let mut errors = Vec::new();
    for pair in defs.windows(2) {
        if pair[0].name == pair[1].name {
            errors.push(ResolveError::DuplicateBundleName(pair[0].name.clone()));
        }
    }
    if let OwnershipPolicy::SharedBundle { name } = policy {
        if defs.iter().any(|d| &d.name == name) {
            errors.push(ResolveError::SharedNameCollision(name.clone()));
        }
    }
    if !errors.is_empty() {
        return Err(ResolveErrors(errors));
    }

    // Fan-out: each bundle's closure is independent; the store is read-only.
    let closure_results: Vec<_> = defs
        .par_iter()
        .map(|def| {
            closure_for_assets(source, &def.explicit_assets).map_err(|e| ResolveError::Bundle {
                bundle: def.name.clone(),
                source: e,
            })
        })
        .collect();

    let mut closures = Vec::with_capacity(defs.len());
    for (def, result) in defs.iter().zip(closure_results) {
        match result {
            Ok((asset_objects, closure)) => closures.push((*def, asset_objects, closure)),
            Err(e) => errors.push(e),
        }
    }
    if !errors.is_empty() {
        return Err(ResolveErrors(errors));
    }

    // Fan-in: ownership needs every closure.
    let assignment = assign_owners(&closures, policy);

    let mut resolved = match wire_dependencies(source, &closures, assignment) {
        Ok(resolved) => resolved,
        Err(errors) => return Err(errors),
    };

    let graph: BTreeMap<String, BTreeSet<String>> = resolved
        .iter()
        .map(|b| (b.assignment.name.clone(), b.assignment.depends_on.clone()))
        .collect();
    if let Some(cycle) = find_cycle(&graph) {
        return Err(ResolveErrors(vec![ResolveError::CyclicBundleDependency {
            cycle,
        }]));
    }

    resolved.sort_by(|a, b| a.assignment.name.cmp(&b.assignment.name));
    Ok(ResolvedBundles { bundles: resolved })
}

/// Maps every closure member to its owning bundle name.
fn assign_owners(
    closures: &[(&BundleDefinition, BTreeMap<Guid, Vec<ObjectIdentifier>>, BTreeSet<ObjectIdentifier>)],
    policy: &OwnershipPolicy,
) -> BTreeMap<ObjectIdentifier, String> {
    // An explicit assignment always wins over an implicit pull-in. When the
    // same asset is explicitly listed by several bundles, the first in name
    // order takes it.
    let mut explicit_owner: BTreeMap<Guid, &str> = BTreeMap::new();
    for (def, _, _) in closures {
        for asset in &def.explicit_assets {
            explicit_owner.entry(*asset).or_insert(def.name.as_str());
        }
    }

    // Claimant lists stay in name order because `closures` is sorted.
    let mut claimants: BTreeMap<ObjectIdentifier, Vec<&str>> = BTreeMap::new();
    for (def, _, closure) in closures {
        for object in closure {
            claimants.entry(*object).or_default().push(def.name.as_str());
        }
    }

    let mut owner_of = BTreeMap::new();
    for (object, claim_list) in &claimants {
        let owner = match explicit_owner.get(&object.guid) {
            Some(bundle) => bundle.to_string(),
            None => match policy {
                OwnershipPolicy::FirstClaimant => claim_list[0].to_string(),
                OwnershipPolicy::SharedBundle { name } if claim_list.len() >= 2 => name.clone(),
                OwnershipPolicy::SharedBundle { .. } => claim_list[0].to_string(),
            },
        };
        owner_of.insert(*object, owner);
    }
    owner_of
}

/// Builds per-bundle assignments and dependency edges from the ownership
/// map, including the synthesized shared bundle when one was produced.
fn wire_dependencies<S: AssetGraphSource + ?Sized>(
    source: &S,
    closures: &[(&BundleDefinition, BTreeMap<Guid, Vec<ObjectIdentifier>>, BTreeSet<ObjectIdentifier>)],
    owner_of: BTreeMap<ObjectIdentifier, String>,
) -> Result<Vec<ResolvedBundle>, ResolveErrors> {
    let mut owned: BTreeMap<&str, BTreeSet<ObjectIdentifier>> = BTreeMap::new();
    for (object, owner) in &owner_of {
        owned.entry(owner.as_str()).or_default().insert(*object);
    }

    let mut errors = Vec::new();
    let mut resolved = Vec::with_capacity(closures.len());
    let defined: BTreeSet<&str> = closures.iter().map(|(d, _, _)| d.name.as_str()).collect();

    for (def, asset_objects, closure) in closures {
        let owned_objects = owned.get(def.name.as_str()).cloned().unwrap_or_default();
        let foreign: BTreeSet<ObjectIdentifier> =
            closure.difference(&owned_objects).copied().collect();

        let mut depends_on = BTreeSet::new();
        for object in &foreign {
            match owner_of.get(object) {
                Some(owner) => {
                    depends_on.insert(owner.clone());
                }
                None => errors.push(ResolveError::OrphanObject { object: *object }),
            }
        }

        resolved.push(ResolvedBundle {
            assignment: BundleAssignment {
                name: def.name.clone(),
                owned_objects,
                referenced_foreign_objects: foreign,
                depends_on,
            },
            explicit_objects: asset_objects.clone(),
            closure: closure.clone(),
            editor_only: def.editor_only,
        });
    }

    // A shared-policy owner that is not a defined bundle becomes its own
    // synthesized bundle. Its objects came out of transitively closed
    // closures, so their references all have owners too.
    let synthesized: Vec<&str> = owned
        .keys()
        .copied()
        .filter(|name| !defined.contains(name))
        .collect();
    for name in synthesized {
        let owned_objects = owned[name].clone();
        let members: Vec<ObjectIdentifier> = owned_objects.iter().copied().collect();

        let references = match source.dependencies_for_objects(&members) {
            Ok(map) => map,
            Err(e) => {
                errors.push(ResolveError::Bundle {
                    bundle: name.to_string(),
                    source: e,
                });
                continue;
            }
        };

        let foreign: BTreeSet<ObjectIdentifier> = references
            .into_values()
            .flatten()
            .filter(|id| !owned_objects.contains(id))
            .collect();

        let mut depends_on = BTreeSet::new();
        for object in &foreign {
            match owner_of.get(object) {
                Some(owner) => {
                    depends_on.insert(owner.clone());
                }
                None => errors.push(ResolveError::OrphanObject { object: *object }),
            }
        }

        let closure: BTreeSet<ObjectIdentifier> =
            owned_objects.union(&foreign).copied().collect();
        resolved.push(ResolvedBundle {
            assignment: BundleAssignment {
                name: name.to_string(),
                owned_objects,
                referenced_foreign_objects: foreign,
                depends_on,
            },
            explicit_objects: BTreeMap::new(),
            closure,
            editor_only: false,
        });
    }

    if errors.is_empty() {
        Ok(resolved)
    } else {
        Err(ResolveErrors(errors))
    }
}

/// Finds one cycle in the bundle dependency graph, as the node path with the
/// starting bundle repeated at the end. Iterative DFS; bundle graphs are
/// small but content graphs feeding them are not, and nothing here may
/// recurse on user input.
fn find_cycle(graph: &BTreeMap<String, BTreeSet<String>>) -> Option<Vec<String>> {
    const WHITE: u8 = 0;
    const GREY: u8 = 1;
    const BLACK: u8 = 2;

    let mut state: BTreeMap<&str, u8> = graph.keys().map(|k| (k.as_str(), WHITE)).collect();

    for start in graph.keys() {
        if state[start.as_str()] != WHITE {
            continue;
        }

        let mut stack: Vec<(&str, Vec<&str>, usize)> = Vec::new();
        state.insert(start.as_str(), GREY);
        stack.push((start.as_str(), children(graph, start), 0));

        while !stack.is_empty() {
            let top = stack.len() - 1;
            let next_child = {
                let frame = &mut stack[top];
                if frame.2 < frame.1.len() {
                    let child = frame.1[frame.2];
                    frame.2 += 1;
                    Some(child)
                } else {
                    None
                }
            };

            match next_child {
                Some(child) => match state.get(child).copied().unwrap_or(BLACK) {
                    WHITE => {
                        state.insert(child, GREY);
                        stack.push((child, children(graph, child), 0));
                    }
                    GREY => {
                        let from = stack
                            .iter()
                            .position(|(n, _, _)| *n == child)
                            .unwrap_or(0);
                        let mut cycle: Vec<String> =
                            stack[from..].iter().map(|(n, _, _)| n.to_string()).collect();
                        cycle.push(child.to_string());
                        return Some(cycle);
                    }
                    _ => {}
                },
                None => {
                    if let Some((node, _, _)) = stack.pop() {
                        state.insert(node, BLACK);
                    }
                }
            }
        }
    }

    None
}

fn children<'a>(graph: &'a BTreeMap<String, BTreeSet<String>>, node: &str) -> Vec<&'a str> {
    graph
        .get(node)
        .map(|set| set.iter().map(|s| s.as_str()).collect())
        .unwrap_or_default()
}
