//! Physical and layout properties of LDOS results.

use std::sync::Arc;

use ldos_core::ldos::prefactor;
use ldos_core::solver::dipole::greens::self_term;
use ldos_core::solver::dipole::{DipoleClusterModel, SurfaceMedium};
use ldos_core::types::{FULL_STRIDE, LDOS_ONLY_STRIDE};
use ldos_core::{EvaluationPoints, LdosOptions, LdosSolver};
use ldos_geometry::discretise::discretise_surface;
use ldos_geometry::primitives::{Primitive, Sphere};
use ldos_geometry::{Geometry, GeometryTransform, Lattice, RigidMotion};
use ldos_materials::MaterialRegistry;
use ndarray::array;
use num_complex::Complex64;

fn gold_sphere(label: &str, centre: [f64; 3]) -> ldos_geometry::Surface {
    let sphere = Primitive::Sphere(Sphere { centre, radius: 0.03 });
    discretise_surface(label, "Au_Drude", &sphere, 0.02)
}

fn gold_model(geometry: &Geometry) -> DipoleClusterModel {
    let registry = MaterialRegistry::with_builtins().unwrap();
    let spacings = vec![0.02; geometry.num_surfaces()];
    DipoleClusterModel::new(geometry, &registry, &spacings).unwrap()
}

fn probes() -> Vec<EvaluationPoints> {
    vec![
        EvaluationPoints::new(
            "line",
            array![[0.0, 0.0, 0.06], [0.0, 0.0, 0.1], [0.08, 0.0, 0.0], [0.05, 0.05, 0.05]],
        )
        .unwrap(),
        EvaluationPoints::new("far", array![[0.0, 0.0, 1.5]]).unwrap(),
    ]
}

#[test]
fn test_stride_matches_mode() {
    let geometry = Geometry::new(vec![gold_sphere("s", [0.0; 3])], None).unwrap();
    let transforms = vec![
        GeometryTransform::identity(),
        GeometryTransform::new("up").with_motion("s", RigidMotion::translation(0.0, 0.0, -0.02)),
    ];
    let omega = Complex64::new(10.0, 0.0);

    for ldos_only in [true, false] {
        let options = LdosOptions {
            ldos_only,
            ..LdosOptions::default()
        };
        let stride = if ldos_only { LDOS_ONLY_STRIDE } else { FULL_STRIDE };
        let model = gold_model(&geometry);
        let mut solver =
            LdosSolver::new(geometry.clone(), model, None, transforms.clone(), probes(), options).unwrap();
        let mut caches = solver.new_caches();
        let results = solver.evaluate(&mut caches, omega, &[]).unwrap();
        assert_eq!(solver.stride(), stride);
        assert_eq!(results.stride, stride);
        assert_eq!(results.values.len(), stride * 5 * 2);
        assert!(results.errors.is_none());
        assert_eq!(results.slice(1, 1).len(), stride);
    }
}

#[test]
fn test_ldos_only_matches_leading_full_columns() {
    let geometry = Geometry::new(vec![gold_sphere("s", [0.0; 3])], None).unwrap();
    let omega = Complex64::new(9.0, 0.0);
    let run = |ldos_only: bool| {
        let options = LdosOptions {
            ldos_only,
            ..LdosOptions::default()
        };
        let mut solver =
            LdosSolver::new(geometry.clone(), gold_model(&geometry), None, vec![], probes(), options).unwrap();
        let mut caches = solver.new_caches();
        solver.evaluate(&mut caches, omega, &[]).unwrap()
    };
    let short = run(true);
    let full = run(false);
    for p in 0..5 {
        for c in 0..2 {
            let a = short.values[p * LDOS_ONLY_STRIDE + c];
            let b = full.values[p * FULL_STRIDE + c];
            assert!((a - b).abs() <= 1e-12 * b.abs().max(1e-12));
        }
    }
}

#[test]
fn test_ldos_positive_near_lossy_metal() {
    let geometry = Geometry::new(
        vec![gold_sphere("s1", [0.0; 3]), gold_sphere("s2", [0.1, 0.0, 0.0])],
        None,
    )
    .unwrap();
    let mut solver = LdosSolver::new(
        geometry.clone(),
        gold_model(&geometry),
        None,
        vec![],
        probes(),
        LdosOptions {
            ldos_only: true,
            ..LdosOptions::default()
        },
    )
    .unwrap();
    let mut caches = solver.new_caches();

    for omega in [6.0, 9.0, 12.0] {
        let results = solver.evaluate(&mut caches, Complex64::new(omega, 0.0), &[]).unwrap();
        for (i, v) in results.values.iter().enumerate() {
            assert!(v.is_finite() && *v > 0.0, "LDOS value {i} at Omega={omega} is {v}");
        }
    }
}

#[test]
fn test_far_point_approaches_vacuum_ldos() {
    let geometry = Geometry::new(vec![gold_sphere("s", [0.0; 3])], None).unwrap();
    let omega = Complex64::new(10.0, 0.0);
    let mut solver = LdosSolver::new(
        geometry.clone(),
        gold_model(&geometry),
        None,
        vec![],
        probes(),
        LdosOptions {
            ldos_only: true,
            ..LdosOptions::default()
        },
    )
    .unwrap();
    let mut caches = solver.new_caches();
    let results = solver.evaluate(&mut caches, omega, &[]).unwrap();

    let vacuum = prefactor(omega) * 3.0 * self_term(omega).im;
    let far = results.slice(0, 1);
    assert!((far[0] - vacuum).abs() < 0.05 * vacuum);
    assert!((far[1] - vacuum).abs() < 0.05 * vacuum);
}

#[test]
fn test_periodic_ldos_even_in_bloch_vector() {
    let lattice = Lattice::new(vec![[0.2, 0.0, 0.0]]).unwrap();
    let geometry = Geometry::new(vec![gold_sphere("s", [0.0; 3])], Some(lattice)).unwrap();
    let mut solver = LdosSolver::new(
        geometry.clone(),
        gold_model(&geometry).with_image_cutoff(3),
        None,
        vec![],
        vec![EvaluationPoints::new("p", array![[0.03, 0.01, 0.07]]).unwrap()],
        LdosOptions {
            ldos_only: true,
            ..LdosOptions::default()
        },
    )
    .unwrap();
    let mut caches = solver.new_caches();
    let omega = Complex64::new(8.0, 0.0);

    let plus = solver.evaluate(&mut caches, omega, &[4.0]).unwrap();
    let minus = solver.evaluate(&mut caches, omega, &[-4.0]).unwrap();
    let gamma = solver.evaluate(&mut caches, omega, &[0.0]).unwrap();
    for c in 0..2 {
        assert!((plus.values[c] - minus.values[c]).abs() <= 1e-9 * minus.values[c].abs());
        assert!(gamma.values[c].is_finite());
    }
}

#[test]
fn test_1d_bloch_vector_follows_lattice_direction() {
    let omega = Complex64::new(4.0, 0.0);
    let run = |a1: [f64; 3], point: [f64; 3], k: f64| {
        let lattice = Lattice::new(vec![a1]).unwrap();
        let node = ldos_geometry::Surface::new("d", "Au_Drude", vec![[0.0; 3]]);
        let geometry = Geometry::new(vec![node], Some(lattice)).unwrap();
        let mut solver = LdosSolver::new(
            geometry.clone(),
            gold_model(&geometry).with_image_cutoff(3),
            None,
            vec![],
            vec![EvaluationPoints::new("p", array![[point[0], point[1], point[2]]]).unwrap()],
            LdosOptions {
                ldos_only: true,
                ..LdosOptions::default()
            },
        )
        .unwrap();
        let mut caches = solver.new_caches();
        solver.evaluate(&mut caches, omega, &[k]).unwrap().values
    };

    let along_y_gamma = run([0.0, 0.4, 0.0], [0.02, 0.05, 0.1], 0.0);
    let along_y = run([0.0, 0.4, 0.0], [0.02, 0.05, 0.1], 5.0);
    assert!((along_y_gamma[0] - along_y[0]).abs() > 1e-3 * along_y_gamma[0].abs());

    // Mirroring x and y maps the x-lattice problem onto the y-lattice one.
    let along_x = run([0.4, 0.0, 0.0], [0.05, 0.02, 0.1], 5.0);
    for c in 0..2 {
        assert!((along_x[c] - along_y[c]).abs() <= 1e-9 * along_x[c].abs());
    }
}
