use std::cell::Cell;

use approx::assert_relative_eq;
use molar::{
    CollisionReport, EvaluationStatus, MolarError, NullHaptics, Simulation, SimulationConfig,
    ToothSlot, ToughnessSource,
};
use molar_grid::{DensityField, GridDims, GridSnapshot, SphereSource, TexCoordField, VoxelSource};
use molar_math::Point3;
use molar_voxelize::TriangleMesh;

fn small_config() -> SimulationConfig {
    let mut config = SimulationConfig::default();
    config.voxelizer.resolution = 24;
    config.builder.triangle_budget = 50_000;
    config
}

fn sphere_snapshot(n: usize, voxel_size: f32) -> GridSnapshot {
    let dims = GridDims::cube(n);
    GridSnapshot::new(
        voxel_size,
        SphereSource.density(dims),
        TexCoordField::filled(dims, [0.5, 0.5]),
    )
    .unwrap()
}

fn temp_path(name: &str) -> std::path::PathBuf {
    std::env::temp_dir().join(format!("molar-{}-{name}", std::process::id()))
}

#[test]
fn test_voxelize_carve_save_reload() {
    let sim = Simulation::new(small_config()).unwrap();
    let pending = sim.voxelize(TriangleMesh::uv_sphere(1.0, 32, 16), Point3::origin());
    let mut tooth = pending.wait(&sim).unwrap();
    assert!(tooth.dims().y > 24);
    let initial_solid = tooth.initial_density().count_above(0.0);
    assert!(initial_solid > 0);

    let drill = sim.config().tools.sphere(Point3::origin(), 1.0);
    for _ in 0..3 {
        tooth.step(&[drill], &mut NullHaptics).unwrap();
    }
    assert_eq!(tooth.steps(), 3);
    let carved = tooth.density().unwrap();
    assert!(carved.count_above(0.0) < initial_solid);

    let path = temp_path("reload.vox");
    tooth.save(&path).unwrap();
    let reloaded = sim.load_tooth(&path, Point3::origin()).unwrap();
    std::fs::remove_file(&path).ok();

    assert_eq!(reloaded.initial_density(), &carved);
    assert_eq!(reloaded.texcoords(), tooth.texcoords());
    assert_eq!(reloaded.voxel_size().to_bits(), tooth.voxel_size().to_bits());
}

#[test]
fn test_step_never_increases_density() {
    let sim = Simulation::new(small_config()).unwrap();
    let mut tooth = sim.tooth(sphere_snapshot(20, 0.05), Point3::origin()).unwrap();
    let tools = [
        sim.config().tools.sphere(Point3::new(0.1, 0.2, 0.0), 1.0),
        sim.config().tools.sphere(Point3::new(-0.1, 0.2, 0.05), 0.5),
    ];
    let mut before = tooth.density().unwrap();
    for _ in 0..4 {
        tooth.step(&tools, &mut NullHaptics).unwrap();
        let after = tooth.density().unwrap();
        for (a, b) in after.as_slice().iter().zip(before.as_slice()) {
            assert!(a <= b);
        }
        before = after;
    }
}

#[test]
fn test_haptics_receive_collisions_only() {
    let sim = Simulation::new(small_config()).unwrap();
    let mut tooth = sim.tooth(sphere_snapshot(20, 0.05), Point3::origin()).unwrap();
    let calls = Cell::new(0);
    let mut sink = |report: &CollisionReport| {
        assert!(report.collided);
        assert!(report.intensity > 0.0 && report.intensity <= 1.0);
        calls.set(calls.get() + 1);
    };

    let inside = sim.config().tools.sphere(Point3::origin(), 1.0);
    let report = tooth.step(&[inside], &mut sink).unwrap();
    assert!(report.collision.collided);
    assert_eq!(calls.get(), 1);

    let outside = sim.config().tools.sphere(Point3::new(5.0, 5.0, 5.0), 1.0);
    let report = tooth.step(&[outside], &mut sink).unwrap();
    assert!(!report.collision.collided);
    assert_eq!(calls.get(), 1);

    let report = tooth.step(&[], &mut sink).unwrap();
    assert_eq!(report.tools, 0);
    assert!(!report.collision.collided);
}

#[test]
fn test_flags_do_not_carry_into_next_step() {
    let mut config = small_config();
    config.toughness = ToughnessSource::Uniform(0.0);
    let sim = Simulation::new(config).unwrap();
    let dims = GridDims::cube(16);
    let snapshot = GridSnapshot::new(
        0.05,
        molar_grid::CubeSource.density(dims),
        TexCoordField::filled(dims, [0.0, 0.0]),
    )
    .unwrap();
    let mut tooth = sim.tooth(snapshot, Point3::origin()).unwrap();

    let drill = sim.config().tools.sphere(Point3::origin(), 1.0);
    let drill = molar::Tool { power: 4.0, ..drill };
    assert!(tooth.step(&[drill], &mut NullHaptics).unwrap().collision.collided);
    assert_eq!(*tooth.density().unwrap().get(8, 8, 8), -1.0);

    // Only the emptied centre voxel is in range now, but the probed region
    // covers neighbours flagged by the first step.
    let narrow = drill.with_range(0.02);
    assert!(!tooth.step(&[narrow], &mut NullHaptics).unwrap().collision.collided);
}

#[test]
fn test_uniform_toughness_slows_carving() {
    let carve_with = |toughness| {
        let mut config = small_config();
        config.toughness = toughness;
        let sim = Simulation::new(config).unwrap();
        let mut tooth = sim.tooth(sphere_snapshot(16, 0.05), Point3::origin()).unwrap();
        let drill = sim.config().tools.sphere(Point3::origin(), 0.5);
        tooth.step(&[drill], &mut NullHaptics).unwrap();
        let density = tooth.density().unwrap();
        *density.get(8, 8, 8)
    };
    let soft = carve_with(ToughnessSource::Uniform(0.0));
    let hard = carve_with(ToughnessSource::Uniform(4.0));
    assert!(soft < hard);
}

#[test]
fn test_undercut_scenario_through_tooth() {
    let mut config = small_config();
    config.evaluation.undercut_allowance = 0;
    let sim = Simulation::new(config).unwrap();

    let dims = GridDims::cube(8);
    let snapshot = GridSnapshot::new(
        0.1,
        DensityField::filled(dims, 1.0),
        TexCoordField::filled(dims, [0.0, 0.0]),
    )
    .unwrap();
    let mut tooth = sim.tooth(snapshot, Point3::origin()).unwrap();

    // Voxel (4, 4, 4) sits at world (0, 0, 0); a narrow tool removes it
    // and leaves (4, 5, 4) standing.
    let drill = sim.config().tools.sphere(Point3::origin(), 4.0).with_range(0.05);
    tooth.step(&[drill], &mut NullHaptics).unwrap();
    let density = tooth.density().unwrap();
    assert!(*density.get(4, 4, 4) <= 0.0);
    assert!(*density.get(4, 5, 4) > 0.1);

    tooth.start_evaluation("molar").unwrap();
    let result = tooth.wait_evaluation().unwrap().unwrap();
    assert_eq!(*result.errors.get(4, 4, 4), molar_eval::MASK_SET);
    assert!(result.score < 100.0);
}

#[test]
fn test_evaluation_is_requested_once() {
    let sim = Simulation::new(small_config()).unwrap();
    let mut tooth = sim.tooth(sphere_snapshot(12, 0.1), Point3::origin()).unwrap();
    assert!(tooth.evaluation().unwrap().is_none());
    assert!(!tooth.cancel_evaluation());

    tooth.start_evaluation("molar").unwrap();
    let first = tooth.wait_evaluation().unwrap().unwrap().clone();
    assert_relative_eq!(first.score, 100.0);
    assert_eq!(first.undercut_count, 0);

    let drill = sim.config().tools.sphere(Point3::origin(), 1.0);
    tooth.step(&[drill], &mut NullHaptics).unwrap();
    tooth.start_evaluation("molar").unwrap();
    let second = tooth.wait_evaluation().unwrap().unwrap();
    assert_eq!(second, &first);
    assert_eq!(
        tooth.evaluation_task().map(|t| t.status()),
        Some(EvaluationStatus::Done)
    );
    // A finished evaluation cannot be cancelled and stays cached.
    assert!(!tooth.cancel_evaluation());
    assert_eq!(tooth.evaluation().unwrap(), Some(&first));

    let overlays = tooth.evaluation_overlays().unwrap().unwrap();
    assert!(overlays.errors.is_empty());
    assert!(!overlays.margin.is_empty());
}

#[test]
fn test_unknown_shape_is_rejected() {
    let sim = Simulation::new(small_config()).unwrap();
    let mut tooth = sim.tooth(sphere_snapshot(8, 0.1), Point3::origin()).unwrap();
    assert!(matches!(
        tooth.start_evaluation("wisdom"),
        Err(MolarError::Eval(_))
    ));
    assert!(tooth.evaluation_task().is_none());
}

#[test]
fn test_slot_rejects_evaluation_while_voxelizing() {
    let sim = Simulation::new(small_config()).unwrap();
    let pending = sim.voxelize(TriangleMesh::cuboid([1.0, 1.0, 1.0]), Point3::origin());
    let mut slot = ToothSlot::Voxelizing(pending);
    assert!(matches!(
        slot.start_evaluation("molar"),
        Err(MolarError::NotReady)
    ));
    assert!(slot.tooth_mut().is_none());

    while !slot.poll(&sim).unwrap() {
        std::thread::yield_now();
    }
    let tooth = slot.tooth_mut().unwrap();
    assert!(tooth.initial_density().count_above(0.0) > 0);
    slot.start_evaluation("molar").unwrap();
}

#[test]
fn test_degenerate_mesh_fails_construction() {
    let sim = Simulation::new(small_config()).unwrap();
    let pending = sim.voxelize(TriangleMesh::new(), Point3::origin());
    assert!(matches!(pending.wait(&sim), Err(MolarError::Voxelize(_))));
}
