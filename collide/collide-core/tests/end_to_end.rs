//! End-to-end collision scenarios with analytical expectations.
//!
//! Each test builds real meshes, runs the full mid-phase + narrow-phase
//! pipeline, and checks values that can be derived by hand:
//!
//! | Scenario | Pipeline | Expectation |
//! |----------|----------|-------------|
//! | Cube vs offset cube | tree-vs-tree | overlap, pairs |
//! | Ray through offset cube | ray collider | hit distance |
//! | Capsule over triangle | capsule SAT | normal, depth bound |
//! | Identical meshes | first-contact | immediate pair, same index |
//! | Ray vs floor triangle | ray narrow phase | t = depth = 2 |
//! | Degenerate triangle | all generators | no contacts, no panic |

use nalgebra::{Isometry3, Point3, Translation3, UnitQuaternion, Vector3};

use collide_core::{
    collide_trimesh_box, collide_trimesh_capsule, collide_trimesh_pair, collide_trimesh_ray,
    mesh::unit_cube_mesh, Obb, ObbCache, ObbCollider, QueryFlags, RayCollider, TreeCollider,
    TriMesh,
};

fn identity() -> Isometry3<f64> {
    Isometry3::identity()
}

fn translated(x: f64, y: f64, z: f64) -> Isometry3<f64> {
    Isometry3::from_parts(Translation3::new(x, y, z), UnitQuaternion::identity())
}

// ============================================================================
// Scenario 1: axis-aligned unit cube vs the same cube offset by half a side
// ============================================================================

#[test]
fn cube_vs_offset_cube_overlaps() {
    let mesh = unit_cube_mesh();
    let mut collider = TreeCollider::new();
    let contact = collider
        .collide(&mesh, &identity(), &mesh, &translated(0.5, 0.0, 0.0), None)
        .expect("collide failed");
    assert!(contact, "overlapping cubes must report contact");
    assert!(!collider.pairs().is_empty());
}

#[test]
fn ray_hits_offset_cube_at_expected_distance() {
    // The second cube spans [0, 1] on X; a ray from (-2, 0, 0) along +X
    // enters through the x = 0 face after traveling 2.
    let mesh = unit_cube_mesh();
    let mut collider = RayCollider::new();
    collider.set_closest_hit(true);
    let contacts = collide_trimesh_ray(
        &mut collider,
        &mesh,
        &translated(0.5, 0.0, 0.0),
        &Point3::new(-2.0, 0.0, 0.0),
        &Vector3::new(1.0, 0.0, 0.0),
        10.0,
        QueryFlags::new(4),
        0,
        1,
        None,
    )
    .expect("ray query failed");

    assert_eq!(contacts.len(), 1);
    let c = contacts[0];
    assert!((c.depth - 2.0).abs() < 1e-9, "hit distance {}", c.depth);
    assert!((c.pos.x - 0.0).abs() < 1e-9);
    assert!(c.normal.x < -0.99, "normal faces the ray origin");
}

// ============================================================================
// Scenario 2: capsule over a triangle in the y = 0 plane
// ============================================================================

#[test]
fn capsule_over_triangle_contact() {
    let mesh = TriMesh::new(
        vec![
            Point3::new(-1.0, 0.0, -0.5),
            Point3::new(1.0, 0.0, -0.5),
            Point3::new(0.0, 0.0, 1.0),
        ],
        vec![0, 1, 2],
    )
    .expect("mesh");

    let mut obb_collider = ObbCollider::new();
    let mut obb_cache = ObbCache::new();
    let contacts = collide_trimesh_capsule(
        &mut obb_collider,
        &mut obb_cache,
        &mesh,
        &identity(),
        &identity(), // capsule at the origin, axis Z
        0.5,
        0.25,
        QueryFlags::new(4),
        0,
        1,
    )
    .expect("capsule query failed");

    assert!(!contacts.is_empty());
    assert!(contacts
        .iter()
        .any(|c| c.normal.dot(&Vector3::y()) > 0.0 && c.depth > 0.0 && c.depth <= 0.25 + 1e-9));
}

// ============================================================================
// Scenario 3: identical meshes in first-contact mode
// ============================================================================

#[test]
fn identical_meshes_first_contact_pairs_same_triangle() {
    let mesh = unit_cube_mesh();
    let mut collider = TreeCollider::new();
    collider.set_first_contact(true);

    let contact = collider
        .collide(&mesh, &identity(), &mesh, &identity(), None)
        .expect("collide failed");
    assert!(contact);
    assert!(!collider.pairs().is_empty());
    let (id0, id1) = collider.pairs()[0];
    assert_eq!(id0, id1, "first pair of identical meshes is self-paired");
}

#[test]
fn mesh_pair_narrow_phase_emits_manifold() {
    let mesh = unit_cube_mesh();
    let mut collider = TreeCollider::new();
    let contacts = collide_trimesh_pair(
        &mut collider,
        &mesh,
        &identity(),
        &mesh,
        &translated(0.5, 0.0, 0.0),
        QueryFlags::new(8),
        3,
        4,
        None,
    )
    .expect("pair query failed");

    assert!(!contacts.is_empty());
    assert!(contacts.len() <= 8);
    for c in &contacts {
        assert_eq!(c.geom1, 3);
        assert_eq!(c.geom2, 4);
        assert!(c.side1 >= 0);
        assert!(c.side2 >= 0, "triangle-triangle contacts carry both sides");
        assert!(c.depth >= 0.0);
    }
    // Dedup invariant: no two contacts share position and normal direction.
    for (i, c1) in contacts.iter().enumerate() {
        for c2 in contacts.iter().skip(i + 1) {
            let same_pos = (c1.pos - c2.pos).norm() < 1e-4;
            let same_dir = 1.0 - c1.normal.dot(&c2.normal).abs() < 1e-4;
            assert!(!(same_pos && same_dir), "duplicate contact survived");
        }
    }
}

// ============================================================================
// Scenario 4: ray vs floor triangle
// ============================================================================

#[test]
fn ray_vs_floor_triangle() {
    let mesh = TriMesh::new(
        vec![
            Point3::new(-5.0, -5.0, 0.0),
            Point3::new(5.0, -5.0, 0.0),
            Point3::new(0.0, 5.0, 0.0),
        ],
        vec![0, 1, 2],
    )
    .expect("mesh");

    let mut collider = RayCollider::new();
    let contacts = collide_trimesh_ray(
        &mut collider,
        &mesh,
        &identity(),
        &Point3::new(0.0, 0.0, 2.0),
        &Vector3::new(0.0, 0.0, -1.0),
        10.0,
        QueryFlags::new(1),
        0,
        1,
        None,
    )
    .expect("ray query failed");

    assert_eq!(contacts.len(), 1);
    let c = contacts[0];
    assert!((c.depth - 2.0).abs() < 1e-12);
    assert!(c.pos.z.abs() < 1e-12);
    assert_eq!(c.side1, 0);
}

// ============================================================================
// Scenario 5 lives in the quadtree module tests (residency bookkeeping).
// ============================================================================

// ============================================================================
// Scenario 6: degenerate triangles never produce contacts or panics
// ============================================================================

#[test]
fn degenerate_triangle_is_silent() {
    // Two coincident vertices: zero-area triangle.
    let mesh = TriMesh::new(
        vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
        ],
        vec![0, 1, 2],
    )
    .expect("degenerate data still builds");

    // Box generator.
    let mut obb_collider = ObbCollider::new();
    let mut obb_cache = ObbCache::new();
    let box_obb = Obb::axis_aligned(Point3::new(0.2, 0.0, 0.0), Vector3::new(0.5, 0.5, 0.5));
    let contacts = collide_trimesh_box(
        &mut obb_collider,
        &mut obb_cache,
        &mesh,
        &identity(),
        &box_obb,
        QueryFlags::new(4),
        0,
        1,
        None,
    )
    .expect("box query failed");
    assert!(contacts.is_empty());

    // Capsule generator.
    let contacts = collide_trimesh_capsule(
        &mut obb_collider,
        &mut obb_cache,
        &mesh,
        &identity(),
        &identity(),
        0.5,
        0.25,
        QueryFlags::new(4),
        0,
        1,
    )
    .expect("capsule query failed");
    assert!(contacts.is_empty());

    // Tree-vs-tree against a healthy mesh.
    let cube = unit_cube_mesh();
    let mut tree_collider = TreeCollider::new();
    let contact = tree_collider
        .collide(&mesh, &identity(), &cube, &identity(), None)
        .expect("collide failed");
    assert!(!contact);

    // Ray straight at the degenerate face.
    let mut ray_collider = RayCollider::new();
    let contacts = collide_trimesh_ray(
        &mut ray_collider,
        &mesh,
        &identity(),
        &Point3::new(0.5, 0.0, 2.0),
        &Vector3::new(0.0, 0.0, -1.0),
        10.0,
        QueryFlags::new(1),
        0,
        1,
        None,
    )
    .expect("ray query failed");
    assert!(contacts.is_empty());
}

// ============================================================================
// Box narrow phase against a mesh under a world transform
// ============================================================================

#[test]
fn box_on_translated_cube_mesh() {
    let mesh = unit_cube_mesh();
    let mesh_world = translated(0.0, 0.0, -0.5); // top face now at z = 0

    // A box hovering so its bottom dips 0.1 below z = 0.
    let box_obb = Obb::axis_aligned(Point3::new(0.0, 0.0, 0.4), Vector3::new(0.25, 0.25, 0.5));
    let mut obb_collider = ObbCollider::new();
    let mut obb_cache = ObbCache::new();
    let contacts = collide_trimesh_box(
        &mut obb_collider,
        &mut obb_cache,
        &mesh,
        &mesh_world,
        &box_obb,
        QueryFlags::new(8),
        0,
        1,
        None,
    )
    .expect("box query failed");

    assert!(!contacts.is_empty());
    assert!(contacts
        .iter()
        .any(|c| c.normal.z < -0.9 && (c.depth - 0.1).abs() < 1e-6));
}

// ============================================================================
// Refit keeps queries correct after deformation
// ============================================================================

#[test]
fn refit_tracks_deformed_geometry() {
    let mut mesh = unit_cube_mesh();
    let mut collider = RayCollider::new();
    collider.set_closest_hit(true);

    // Before deformation the +X face sits at x = 0.5.
    collider
        .collide(
            &Point3::new(5.0, 0.0, 0.0),
            &Vector3::new(-1.0, 0.0, 0.0),
            &mesh,
            &identity(),
        )
        .expect("ray failed");
    assert!((collider.hits()[0].distance - 4.5).abs() < 1e-9);

    // Stretch the +X face out to x = 2 and refit.
    for i in 0..8 {
        let v = mesh.vertices()[i];
        if v.x > 0.0 {
            mesh.set_vertex(i, Point3::new(2.0, v.y, v.z));
        }
    }
    mesh.refit().expect("refit failed");

    collider
        .collide(
            &Point3::new(5.0, 0.0, 0.0),
            &Vector3::new(-1.0, 0.0, 0.0),
            &mesh,
            &identity(),
        )
        .expect("ray failed");
    assert!(
        (collider.hits()[0].distance - 3.0).abs() < 1e-9,
        "refit BVH must see the stretched face, got {}",
        collider.hits()[0].distance
    );
}
