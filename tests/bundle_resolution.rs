//! Resolver and emitter integration tests over a richer content graph:
//! ownership invariants, dependency wiring, and the core/levels scenario.

use pak_model::{BundleDefinition, Guid, ObjectIdentifier};
use paklane::closure::compute_closure;
use paklane::command::emit_commands;
use paklane::resolve::{resolve_bundles, OwnershipPolicy, ResolveError};
use pak_store::InMemoryAssetStore;
use std::collections::BTreeSet;

fn guid(byte: u8) -> Guid {
    Guid(uuid::Uuid::from_bytes([byte; 16]))
}

fn obj(asset: u8, local_id: i64) -> ObjectIdentifier {
    ObjectIdentifier::new(guid(asset), local_id, 0)
}

fn definition(name: &str, assets: &[u8]) -> BundleDefinition {
    BundleDefinition {
        name: name.to_string(),
        explicit_assets: assets.iter().map(|b| guid(*b)).collect(),
        editor_only: false,
    }
}

/// A game-shaped fixture: characters and levels both lean on shared art,
/// everything leans on core shaders, and a sound bank has cyclic internal
/// references.
///
///   asset 1 (shaders):    1.1, 1.2
///   asset 2 (shared art): 2.1 -> 1.1
///   asset 3 (characters): 3.1 -> 2.1, 3.2 -> 1.2
///   asset 4 (levels):     4.1 -> 2.1, 4.2 -> 4.1
///   asset 5 (sounds):     5.1 <-> 5.2
fn game_store() -> InMemoryAssetStore {
    let mut store = InMemoryAssetStore::new();
    store
        .add_object(obj(1, 1), "vertex shader")
        .add_object(obj(1, 2), "fragment shader")
        .add_object(obj(2, 1), "shared material")
        .add_object(obj(3, 1), "character mesh")
        .add_object(obj(3, 2), "character skin")
        .add_object(obj(4, 1), "level terrain")
        .add_object(obj(4, 2), "level props")
        .add_object(obj(5, 1), "sound bank")
        .add_object(obj(5, 2), "sound cue");
    store.add_reference(obj(2, 1), obj(1, 1));
    store.add_reference(obj(3, 1), obj(2, 1));
    store.add_reference(obj(3, 2), obj(1, 2));
    store.add_reference(obj(4, 1), obj(2, 1));
    store.add_reference(obj(4, 2), obj(4, 1));
    store.add_reference(obj(5, 1), obj(5, 2));
    store.add_reference(obj(5, 2), obj(5, 1));
    store
}

fn game_definitions() -> Vec<BundleDefinition> {
    vec![
        definition("characters", &[3]),
        definition("levels", &[4]),
        definition("shaders", &[1]),
        definition("sounds", &[5]),
    ]
}

#[test]
fn test_every_closure_member_is_owned_exactly_once() {
    let store = game_store();
    let resolved =
        resolve_bundles(&store, &game_definitions(), &OwnershipPolicy::FirstClaimant).unwrap();

    let mut owned = BTreeSet::new();
    let mut closure_union = BTreeSet::new();
    for bundle in &resolved.bundles {
        for object in &bundle.assignment.owned_objects {
            assert!(owned.insert(*object), "{object} owned by two bundles");
        }
        closure_union.extend(bundle.closure.iter().copied());
    }
    assert_eq!(owned, closure_union);
    assert_eq!(owned.len(), 9);
}

#[test]
fn test_foreign_references_resolve_and_match_depends_on() {
    let store = game_store();
    let resolved =
        resolve_bundles(&store, &game_definitions(), &OwnershipPolicy::FirstClaimant).unwrap();

    for bundle in &resolved.bundles {
        let mut owners = BTreeSet::new();
        for object in &bundle.assignment.referenced_foreign_objects {
            let owner: Vec<_> = resolved
                .bundles
                .iter()
                .filter(|other| other.assignment.owned_objects.contains(object))
                .map(|other| other.assignment.name.clone())
                .collect();
            assert_eq!(owner.len(), 1, "{object} must have exactly one owner");
            owners.insert(owner[0].clone());
        }
        assert_eq!(owners, bundle.assignment.depends_on);
    }
}

#[test]
fn test_shared_material_goes_to_first_claimant() {
    let store = game_store();
    let resolved =
        resolve_bundles(&store, &game_definitions(), &OwnershipPolicy::FirstClaimant).unwrap();

    // Asset 2 is explicit nowhere; "characters" precedes "levels".
    let characters = resolved.get("characters").unwrap();
    assert!(characters.assignment.owned_objects.contains(&obj(2, 1)));

    let levels = resolved.get("levels").unwrap();
    assert!(levels
        .assignment
        .referenced_foreign_objects
        .contains(&obj(2, 1)));
    assert!(levels.assignment.depends_on.contains("characters"));
}

#[test]
fn test_explicit_shader_bundle_owns_its_objects() {
    let store = game_store();
    let resolved =
        resolve_bundles(&store, &game_definitions(), &OwnershipPolicy::FirstClaimant).unwrap();

    let shaders = resolved.get("shaders").unwrap();
    assert_eq!(
        shaders.assignment.owned_objects,
        BTreeSet::from([obj(1, 1), obj(1, 2)])
    );
    assert!(shaders.assignment.depends_on.is_empty());

    // Both consumers depend on it.
    for name in ["characters", "levels"] {
        let closure_has_shader = resolved.get(name).unwrap().closure.contains(&obj(1, 1));
        let depends = resolved
            .get(name)
            .unwrap()
            .assignment
            .depends_on
            .contains("shaders");
        assert_eq!(closure_has_shader, depends);
    }
}

#[test]
fn test_cyclic_objects_within_one_bundle_are_fine() {
    let store = game_store();
    let resolved =
        resolve_bundles(&store, &game_definitions(), &OwnershipPolicy::FirstClaimant).unwrap();

    // The sound bank's internal reference cycle stays inside one bundle and
    // produces no bundle-level cycle.
    let sounds = resolved.get("sounds").unwrap();
    assert_eq!(sounds.assignment.owned_objects.len(), 2);
    assert!(sounds.assignment.depends_on.is_empty());
}

#[test]
fn test_shared_bundle_policy_on_game_fixture() {
    let store = game_store();
    let policy = OwnershipPolicy::SharedBundle {
        name: "common".to_string(),
    };
    let resolved = resolve_bundles(&store, &game_definitions(), &policy).unwrap();

    // The shared material is multi-claimed and implicit; the shaders it
    // pulls in are explicit in "shaders" and stay there.
    let common = resolved.get("common").unwrap();
    assert_eq!(
        common.assignment.owned_objects,
        BTreeSet::from([obj(2, 1)])
    );
    assert_eq!(
        common.assignment.depends_on,
        BTreeSet::from(["shaders".to_string()])
    );
}

#[test]
fn test_emitted_commands_match_assignments() {
    let store = game_store();
    let resolved =
        resolve_bundles(&store, &game_definitions(), &OwnershipPolicy::FirstClaimant).unwrap();
    let commands = emit_commands(&resolved);

    assert_eq!(commands.len(), resolved.bundles.len());
    for (command, bundle) in commands.iter().zip(&resolved.bundles) {
        assert_eq!(command.bundle_name, bundle.assignment.name);
        let ids: BTreeSet<_> = command.object_ids().copied().collect();
        assert_eq!(ids, bundle.assignment.owned_objects);
        let deps: BTreeSet<_> = command.dependencies.iter().cloned().collect();
        assert_eq!(deps, bundle.assignment.depends_on);
    }
}

#[test]
fn test_closure_idempotence_on_game_graph() {
    let store = game_store();
    let seeds = BTreeSet::from([obj(3, 1), obj(3, 2)]);

    let closure = compute_closure(&store, &seeds).unwrap();
    let again = compute_closure(&store, &closure).unwrap();
    assert_eq!(closure, again);
}

#[test]
fn test_two_bundle_cycle_names_the_cycle() {
    let mut store = InMemoryAssetStore::new();
    store.add_object(obj(1, 1), "a").add_object(obj(2, 1), "b");
    store.add_reference(obj(1, 1), obj(2, 1));
    store.add_reference(obj(2, 1), obj(1, 1));

    let defs = vec![definition("alpha", &[1]), definition("beta", &[2])];
    let errors = resolve_bundles(&store, &defs, &OwnershipPolicy::FirstClaimant).unwrap_err();

    let cycle = errors
        .0
        .iter()
        .find_map(|e| match e {
            ResolveError::CyclicBundleDependency { cycle } => Some(cycle.clone()),
            _ => None,
        })
        .expect("expected a cycle error");
    assert!(cycle.contains(&"alpha".to_string()));
    assert!(cycle.contains(&"beta".to_string()));

    // The message names the cycle for the user.
    let message = errors.to_string();
    assert!(message.contains("alpha"));
    assert!(message.contains("beta"));
}

#[test]
fn test_three_bundle_chain_is_acyclic() {
    let mut store = InMemoryAssetStore::new();
    store
        .add_object(obj(1, 1), "a")
        .add_object(obj(2, 1), "b")
        .add_object(obj(3, 1), "c");
    store.add_reference(obj(1, 1), obj(2, 1));
    store.add_reference(obj(2, 1), obj(3, 1));

    let defs = vec![
        definition("top", &[1]),
        definition("mid", &[2]),
        definition("base", &[3]),
    ];
    let resolved = resolve_bundles(&store, &defs, &OwnershipPolicy::FirstClaimant).unwrap();

    assert_eq!(
        resolved.get("top").unwrap().assignment.depends_on,
        BTreeSet::from(["base".to_string(), "mid".to_string()])
    );
    assert_eq!(
        resolved.get("mid").unwrap().assignment.depends_on,
        BTreeSet::from(["base".to_string()])
    );
    assert!(resolved.get("base").unwrap().assignment.depends_on.is_empty());
}
