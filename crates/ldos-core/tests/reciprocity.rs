//! Reciprocity of the two-point Green's functions: G(x, x'; k) = G(x', x; -k)^T
//! in every assembly mode.

use std::sync::Arc;

use ldos_core::solver::dipole::{DipoleClusterModel, SurfaceMedium};
use ldos_core::substrate::{GroundPlane, SubstrateSolver};
use ldos_core::types::FULL_STRIDE;
use ldos_core::{EvaluationPoints, LdosOptions, LdosResults, LdosSolver};
use ldos_geometry::{Geometry, GeometryTransform, Lattice, RigidMotion, Surface};
use ldos_materials::analytic::ConstantMaterial;
use ndarray::array;
use num_complex::Complex64;

type Tensor = [[Complex64; 3]; 3];

const X: [f64; 3] = [0.12, -0.05, 0.21];
const XP: [f64; 3] = [0.31, 0.18, 0.33];

fn model(n: usize) -> DipoleClusterModel {
    let medium = SurfaceMedium {
        material: Arc::new(ConstantMaterial::new("lossy", Complex64::new(-4.0, 0.6))),
        cell_volume: 1e-4,
    };
    DipoleClusterModel::from_media(vec![medium; n]).with_image_cutoff(2)
}

fn dimer(lattice: Option<Lattice>) -> Geometry {
    Geometry::new(
        vec![
            Surface::new("a", "lossy", vec![[0.0, 0.0, 0.0], [0.05, 0.0, 0.0]]),
            Surface::new("b", "lossy", vec![[0.3, 0.1, 0.0], [0.3, 0.15, 0.05]]),
        ],
        lattice,
    )
    .unwrap()
}

fn pairs() -> Vec<EvaluationPoints> {
    vec![EvaluationPoints::new(
        "pairs",
        array![
            [X[0], X[1], X[2], XP[0], XP[1], XP[2]],
            [XP[0], XP[1], XP[2], X[0], X[1], X[2]]
        ],
    )
    .unwrap()]
}

fn tensor(results: &LdosResults, transform: usize, p: usize, magnetic: bool) -> Tensor {
    let values = results.slice(transform, 0);
    let base = p * FULL_STRIDE + 2 + if magnetic { 18 } else { 0 };
    let mut t = [[Complex64::new(0.0, 0.0); 3]; 3];
    for (mu, row) in t.iter_mut().enumerate() {
        for (nu, entry) in row.iter_mut().enumerate() {
            let q = base + 2 * (3 * mu + nu);
            *entry = Complex64::new(values[q], values[q + 1]);
        }
    }
    t
}

fn assert_transposed(forward: &Tensor, backward: &Tensor) {
    let scale = forward.iter().flatten().fold(0.0_f64, |m, z| m.max(z.norm()));
    assert!(scale > 0.0);
    for mu in 0..3 {
        for nu in 0..3 {
            let diff = (forward[mu][nu] - backward[nu][mu]).norm();
            assert!(
                diff <= 1e-8 * scale,
                "G[{mu}][{nu}] = {} but transposed partner is {}",
                forward[mu][nu],
                backward[nu][mu]
            );
        }
    }
}

#[test]
fn test_reciprocity_single_transform_compact() {
    let mut solver =
        LdosSolver::new(dimer(None), model(2), None, vec![], pairs(), LdosOptions::default()).unwrap();
    let mut caches = solver.new_caches();
    let results = solver.evaluate(&mut caches, Complex64::new(5.0, 0.0), &[]).unwrap();

    for magnetic in [false, true] {
        assert_transposed(&tensor(&results, 0, 0, magnetic), &tensor(&results, 0, 1, magnetic));
    }
}

#[test]
fn test_reciprocity_periodic_flips_bloch_vector() {
    let lattice = Lattice::square(0.6).unwrap();
    let mut solver = LdosSolver::new(
        dimer(Some(lattice)),
        model(2),
        None,
        vec![],
        pairs(),
        LdosOptions::default(),
    )
    .unwrap();
    let mut caches = solver.new_caches();
    let omega = Complex64::new(4.0, 0.0);
    let plus = solver.evaluate(&mut caches, omega, &[1.1, -0.7]).unwrap();
    let minus = solver.evaluate(&mut caches, omega, &[-1.1, 0.7]).unwrap();

    for magnetic in [false, true] {
        assert_transposed(&tensor(&plus, 0, 0, magnetic), &tensor(&minus, 0, 1, magnetic));
    }
}

#[test]
fn test_reciprocity_under_every_transform() {
    let transforms = vec![
        GeometryTransform::new("lifted").with_motion("b", RigidMotion::translation(0.0, 0.0, 0.1)),
        GeometryTransform::new("turned")
            .with_motion("b", RigidMotion::rotation_about([0.0, 0.0, 1.0], 90.0).unwrap()),
    ];
    let mut solver =
        LdosSolver::new(dimer(None), model(2), None, transforms, pairs(), LdosOptions::default())
            .unwrap();
    let mut caches = solver.new_caches();
    let results = solver.evaluate(&mut caches, Complex64::new(5.0, 0.0), &[]).unwrap();

    assert_eq!(results.num_transforms(), 2);
    for t in 0..2 {
        for magnetic in [false, true] {
            assert_transposed(&tensor(&results, t, 0, magnetic), &tensor(&results, t, 1, magnetic));
        }
    }
}

#[test]
fn test_reciprocity_ground_plane() {
    let substrate: Box<dyn SubstrateSolver> = Box::new(GroundPlane::default());
    let mut solver = LdosSolver::new(
        Geometry::new(vec![], None).unwrap(),
        model(0),
        Some(substrate),
        vec![],
        pairs(),
        LdosOptions {
            scattering_only: true,
            ..LdosOptions::default()
        },
    )
    .unwrap();
    let mut caches = solver.new_caches();
    let results = solver.evaluate(&mut caches, Complex64::new(6.0, 0.0), &[]).unwrap();

    for magnetic in [false, true] {
        assert_transposed(&tensor(&results, 0, 0, magnetic), &tensor(&results, 0, 1, magnetic));
    }
}
