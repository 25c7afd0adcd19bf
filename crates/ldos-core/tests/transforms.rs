//! Geometry transforms: round trips and self-block reuse.

use std::sync::Arc;

use ldos_core::solver::assembly::{assemble_pairwise, BlockCaches, SystemMatrix};
use ldos_core::solver::dipole::{DipoleClusterModel, SurfaceMedium};
use ldos_core::{EvaluationPoints, LdosOptions, LdosSolver};
use ldos_geometry::{Geometry, GeometryTransform, RigidMotion, Surface};
use ldos_materials::analytic::ConstantMaterial;
use ndarray::array;
use num_complex::Complex64;

fn model(n: usize) -> DipoleClusterModel {
    let medium = SurfaceMedium {
        material: Arc::new(ConstantMaterial::new("metal", Complex64::new(-6.0, 1.2))),
        cell_volume: 1e-4,
    };
    DipoleClusterModel::from_media(vec![medium; n])
}

/// Two mated squares of nodes plus an unrelated dot.
fn trimer() -> Geometry {
    let square = |x0: f64| {
        vec![
            [x0, 0.0, 0.0],
            [x0 + 0.04, 0.0, 0.0],
            [x0, 0.04, 0.0],
            [x0 + 0.04, 0.04, 0.0],
        ]
    };
    Geometry::new(
        vec![
            Surface::new("left", "metal", square(0.0)),
            Surface::new("right", "metal", square(0.25)),
            Surface::new("dot", "metal", vec![[0.1, 0.3, 0.05]]),
        ],
        None,
    )
    .unwrap()
}

fn scan() -> Vec<GeometryTransform> {
    vec![
        GeometryTransform::identity(),
        GeometryTransform::new("shifted").with_motion("right", RigidMotion::translation(0.05, 0.0, 0.02)),
        GeometryTransform::new("rotated")
            .with_motion("right", RigidMotion::rotation_about([0.0, 1.0, 0.0], 40.0).unwrap())
            .with_motion("dot", RigidMotion::translation(0.0, 0.0, 0.1)),
    ]
}

fn probes() -> Vec<EvaluationPoints> {
    vec![
        EvaluationPoints::new("gap", array![[0.15, 0.02, 0.05], [0.15, 0.02, 0.15]]).unwrap(),
        EvaluationPoints::new("above", array![[0.0, 0.0, 0.4]]).unwrap(),
    ]
}

fn assert_close(a: &[f64], b: &[f64]) {
    assert_eq!(a.len(), b.len());
    for (i, (x, y)) in a.iter().zip(b).enumerate() {
        assert!(
            (x - y).abs() <= 1e-9 * y.abs().max(1e-6),
            "value {i}: {x} vs {y}"
        );
    }
}

#[test]
fn test_geometry_restored_after_every_call() {
    let before = trimer().surfaces().to_vec();
    let mut solver =
        LdosSolver::new(trimer(), model(3), None, scan(), probes(), LdosOptions::default()).unwrap();
    let mut caches = solver.new_caches();
    solver.evaluate(&mut caches, Complex64::new(3.0, 0.0), &[]).unwrap();
    assert_eq!(solver.geometry().surfaces(), &before[..]);
    solver.evaluate(&mut caches, Complex64::new(3.5, 0.0), &[]).unwrap();
    assert_eq!(solver.geometry().surfaces(), &before[..]);
}

#[test]
fn test_diagonal_blocks_bit_identical_after_round_trip() {
    let mut g = trimer();
    let m = model(3);
    let omega = Complex64::new(4.0, 0.1);

    let mut before = SystemMatrix::new(&g);
    assemble_pairwise(&m, &g, None, omega, &[], &mut before, &mut BlockCaches::new(&g)).unwrap();

    for t in scan() {
        let guard = g.apply_transform(&t).unwrap();
        drop(guard);
    }

    let mut after = SystemMatrix::new(&g);
    assemble_pairwise(&m, &g, None, omega, &[], &mut after, &mut BlockCaches::new(&g)).unwrap();
    for ns in 0..g.num_surfaces() {
        assert_eq!(before.block(ns, ns), after.block(ns, ns));
    }
    assert_eq!(before.as_array(), after.as_array());
}

#[test]
fn test_block_reuse_matches_fresh_assembly() {
    let omega = Complex64::new(4.5, 0.0);
    let run = |reuse: bool| {
        let options = LdosOptions {
            reuse_diagonal_blocks: reuse,
            ..LdosOptions::default()
        };
        let mut solver = LdosSolver::new(trimer(), model(3), None, scan(), probes(), options).unwrap();
        let mut caches = solver.new_caches();
        solver.evaluate(&mut caches, omega, &[]).unwrap()
    };
    let reused = run(true);
    let fresh = run(false);
    assert_close(&reused.values, &fresh.values);
}

#[test]
fn test_multi_transform_matches_separate_runs() {
    let omega = Complex64::new(4.5, 0.0);
    let options = LdosOptions {
        ldos_only: true,
        ..LdosOptions::default()
    };
    let mut multi = LdosSolver::new(trimer(), model(3), None, scan(), probes(), options.clone()).unwrap();
    let mut caches = multi.new_caches();
    let combined = multi.evaluate(&mut caches, omega, &[]).unwrap();

    for (t, transform) in scan().into_iter().enumerate() {
        let mut single =
            LdosSolver::new(trimer(), model(3), None, vec![transform], probes(), options.clone()).unwrap();
        let mut caches = single.new_caches();
        let alone = single.evaluate(&mut caches, omega, &[]).unwrap();
        for set in 0..2 {
            assert_close(combined.slice(t, set), alone.slice(0, set));
        }
    }
}
