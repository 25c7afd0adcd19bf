//! Job runner: ties together geometry, materials, the LDOS solver and the
//! result writer, then sweeps every (Omega, kBloch) point.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use num_complex::Complex64;

use ldos_core::output::{write_json_summary, EvaluationRecord, ResultWriter, RunSummary};
use ldos_core::solver::dipole::DipoleClusterModel;
use ldos_core::substrate::{GroundPlane, HalfSpace, SubstrateSolver};
use ldos_core::{EvaluationPoints, LdosOptions, LdosSolver, SolverError, Tolerances};
use ldos_geometry::discretise::discretise_surface;
use ldos_geometry::parsers::points::read_points;
use ldos_geometry::parsers::transforms::read_transforms;
use ldos_geometry::primitives::{Cuboid, Cylinder, Ellipsoid, Primitive, Sphere};
use ldos_geometry::{Geometry, GeometryTransform, Lattice, Surface};
use ldos_materials::analytic::{ConstantMaterial, DrudeLorentzMaterial};
use ldos_materials::tabulated::TabulatedMaterial;
use ldos_materials::MaterialRegistry;

use crate::config::{
    JobConfig, MaterialModel, OnSingular, PointSource, ShapeConfig, SubstrateConfig,
};

/// A job with every input resolved, ready to sweep.
pub struct PreparedJob {
    pub solver: LdosSolver<DipoleClusterModel>,
    pub omegas: Vec<Complex64>,
    /// One entry per Bloch vector; a single empty vector for compact geometries.
    pub k_points: Vec<Vec<f64>>,
}

/// What a finished run produced.
#[derive(Debug)]
pub struct RunReport {
    pub evaluations: usize,
    pub skipped: usize,
    pub files: Vec<PathBuf>,
}

/// Resolve materials, geometry, transforms and point sets. Relative paths are
/// taken relative to `base_dir`, the directory of the job file.
pub fn prepare(job: &JobConfig, base_dir: &Path) -> Result<PreparedJob> {
    let registry = build_registry(job, base_dir)?;
    let (geometry, spacings) = build_geometry(job, base_dir)?;
    let transforms = load_transforms(job, base_dir)?;
    let point_sets = load_point_sets(job, base_dir)?;
    let (substrate, tolerances) = build_substrate(job, &registry)?;

    let model = DipoleClusterModel::new(&geometry, &registry, &spacings)?
        .with_image_cutoff(job.geometry.image_cutoff);
    let k_points = bloch_vectors(job, geometry.ldim())?;
    let options = LdosOptions {
        ldos_only: job.simulation.ldos_only,
        scattering_only: job.simulation.scattering_only,
        tolerances,
        reuse_diagonal_blocks: job.simulation.reuse_diagonal_blocks,
    };
    let solver = LdosSolver::new(geometry, model, substrate, transforms, point_sets, options)?;

    let omegas = job.simulation.frequencies.omegas();
    if omegas.is_empty() {
        anyhow::bail!("No frequencies to evaluate; check [simulation] frequencies");
    }
    Ok(PreparedJob {
        solver,
        omegas,
        k_points,
    })
}

/// Run the sweep, appending results under `out_dir`.
pub fn run_job(job: &JobConfig, base_dir: &Path, out_dir: &Path) -> Result<RunReport> {
    let PreparedJob {
        mut solver,
        omegas,
        k_points,
    } = prepare(job, base_dir)?;

    println!(
        "  {} surface(s), {} basis functions, {} transform(s), {} point set(s)",
        solver.geometry().num_surfaces(),
        solver.geometry().total_basis_functions(),
        solver.transforms().len(),
        solver.point_sets().len()
    );
    println!("  Assembly: {}", solver.strategy().name());

    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("Cannot create output directory {}", out_dir.display()))?;
    let mut writer = ResultWriter::new(
        out_dir,
        job.output.file_base.clone(),
        solver.point_sets(),
        solver.transform_tags(),
        solver.geometry().ldim(),
    );
    let mut caches = solver.new_caches();
    let mut records = Vec::new();
    let mut files: Vec<PathBuf> = Vec::new();
    let mut skipped = 0;
    let total = omegas.len() * k_points.len();
    let start = Instant::now();

    for (wi, &omega) in omegas.iter().enumerate() {
        for (ki, k) in k_points.iter().enumerate() {
            let index = wi * k_points.len() + ki + 1;
            let results = match solver.evaluate(&mut caches, omega, k) {
                Ok(results) => results,
                Err(e @ SolverError::SingularMatrix { .. })
                    if job.simulation.on_singular == OnSingular::Skip =>
                {
                    log::warn!("{}; skipping", e);
                    skipped += 1;
                    continue;
                }
                Err(e) => {
                    return Err(e).with_context(|| format!("Evaluation {} of {} failed", index, total))
                }
            };

            for path in writer.write(solver.point_sets(), omega, k, &results)? {
                if !files.contains(&path) {
                    files.push(path);
                }
            }
            if index % 10 == 0 || index == 1 || index == total {
                println!(
                    "  [{}/{}] Omega={:.4}{:+.4}i k={:?}: ELDOS[0]={:.4e}",
                    index,
                    total,
                    omega.re,
                    omega.im,
                    k,
                    results.values.first().copied().unwrap_or(f64::NAN)
                );
            }
            if job.output.save_json {
                records.push(EvaluationRecord {
                    omega: [omega.re, omega.im],
                    k_bloch: k.clone(),
                    results,
                });
            }
        }
    }

    if job.output.save_json {
        let path = out_dir.join(format!("{}.json", job.output.file_base));
        let summary = RunSummary {
            point_sets: solver.point_sets().iter().map(|s| s.label.clone()).collect(),
            transforms: solver.transform_tags(),
            stride: solver.stride(),
            evaluations: records,
        };
        write_json_summary(&path, &summary)?;
        files.push(path);
    }

    println!("  Sweep finished in {:.2?}", start.elapsed());
    Ok(RunReport {
        evaluations: total - skipped,
        skipped,
        files,
    })
}

/// Built-in materials plus the job's `[[material]]` definitions.
fn build_registry(job: &JobConfig, base_dir: &Path) -> Result<MaterialRegistry> {
    let mut registry = MaterialRegistry::with_builtins()?;
    for m in &job.material {
        match &m.model {
            MaterialModel::Constant { epsilon } => {
                registry.register(&m.id, ConstantMaterial::new(&m.id, Complex64::new(epsilon[0], epsilon[1])));
            }
            MaterialModel::Drude {
                eps_inf,
                omega_p,
                gamma,
                oscillators,
            } => {
                let material = oscillators.iter().fold(
                    DrudeLorentzMaterial::drude(&m.id, *eps_inf, *omega_p, *gamma),
                    |acc, &[strength, omega0, width]| acc.with_oscillator(strength, omega0, width),
                );
                registry.register(&m.id, material);
            }
            MaterialModel::Tabulated { file, columns } => {
                let path = base_dir.join(file);
                let (rows, width) = read_points(&path)
                    .with_context(|| format!("Material '{}': cannot read {}", m.id, path.display()))?;
                if width != 3 {
                    anyhow::bail!("Material '{}': table rows need 3 columns, got {}", m.id, width);
                }
                let rows: Vec<(f64, f64, f64)> = rows.iter().map(|r| (r[0], r[1], r[2])).collect();
                let material = match columns.as_str() {
                    "eps" => TabulatedMaterial::from_wavelength_eps(&m.id, &rows)?,
                    "nk" => TabulatedMaterial::from_wavelength_nk(&m.id, &rows)?,
                    other => anyhow::bail!(
                        "Material '{}': unknown columns '{}'. Valid: eps, nk",
                        m.id,
                        other
                    ),
                };
                registry.register(&m.id, material);
            }
        }
    }
    Ok(registry)
}

/// Discretise every surface; returns the geometry and per-surface spacings.
fn build_geometry(job: &JobConfig, base_dir: &Path) -> Result<(Geometry, Vec<f64>)> {
    let mut surfaces = Vec::with_capacity(job.geometry.surface.len());
    let mut spacings = Vec::with_capacity(job.geometry.surface.len());

    for s in &job.geometry.surface {
        if s.spacing <= 0.0 {
            anyhow::bail!("Surface '{}': spacing must be positive", s.label);
        }
        let surface = match &s.shape {
            ShapeConfig::Primitive { shape_type, params } => {
                let primitive = build_primitive(shape_type, params, &s.label)?;
                discretise_surface(&s.label, &s.material, &primitive, s.spacing)
            }
            ShapeConfig::File { nodes_file } => {
                let path = base_dir.join(nodes_file);
                let (rows, width) = read_points(&path)
                    .with_context(|| format!("Surface '{}': cannot read {}", s.label, path.display()))?;
                if width != 3 {
                    anyhow::bail!("Surface '{}': node rows need 3 columns, got {}", s.label, width);
                }
                let nodes = rows.iter().map(|r| [r[0], r[1], r[2]]).collect();
                Surface::new(&s.label, &s.material, nodes)
            }
        };
        if surface.nodes.is_empty() {
            anyhow::bail!(
                "Surface '{}' has no nodes; check its size against spacing {}",
                s.label,
                s.spacing
            );
        }
        println!(
            "  Surface '{}': {} nodes (spacing={} μm, material={})",
            s.label,
            surface.nodes.len(),
            s.spacing,
            s.material
        );
        surfaces.push(surface);
        spacings.push(s.spacing);
    }

    let lattice = job
        .geometry
        .lattice
        .as_ref()
        .map(|vectors| Lattice::new(vectors.clone()))
        .transpose()?;
    Ok((Geometry::new(surfaces, lattice)?, spacings))
}

/// Build a primitive from the TOML shape parameters.
fn build_primitive(shape_type: &str, params: &toml::Value, label: &str) -> Result<Primitive> {
    let scalar = |key: &str| {
        get_f64(params, key).with_context(|| format!("Surface '{}': {} requires '{}'", label, shape_type, key))
    };
    let vector = |key: &str, default: Option<[f64; 3]>| {
        extract_f64_array(params, key)
            .or(default)
            .with_context(|| format!("Surface '{}': {} requires '{} = [x, y, z]'", label, shape_type, key))
    };
    match shape_type {
        "sphere" => Ok(Primitive::Sphere(Sphere {
            centre: vector("centre", Some([0.0; 3]))?,
            radius: scalar("radius")?,
        })),
        "cylinder" => Ok(Primitive::Cylinder(Cylinder {
            base_centre: vector("base_centre", Some([0.0; 3]))?,
            axis: vector("axis", Some([0.0, 0.0, 1.0]))?,
            length: scalar("length")?,
            radius: scalar("radius")?,
        })),
        "cuboid" => Ok(Primitive::Cuboid(Cuboid {
            centre: vector("centre", Some([0.0; 3]))?,
            half_extents: vector("half_extents", None)?,
        })),
        "ellipsoid" => Ok(Primitive::Ellipsoid(Ellipsoid {
            centre: vector("centre", Some([0.0; 3]))?,
            semi_axes: vector("semi_axes", None)?,
        })),
        other => anyhow::bail!(
            "Unsupported shape type '{}' for surface '{}'. Valid types: sphere, cylinder, cuboid, ellipsoid",
            other,
            label
        ),
    }
}

/// Numeric TOML value, accepting integers as well as floats.
fn get_f64(params: &toml::Value, key: &str) -> Option<f64> {
    let value = params.get(key)?;
    value.as_float().or_else(|| value.as_integer().map(|i| i as f64))
}

fn extract_f64_array(params: &toml::Value, key: &str) -> Option<[f64; 3]> {
    let arr = params.get(key)?.as_array()?;
    if arr.len() != 3 {
        return None;
    }
    let at = |i: usize| arr[i].as_float().or_else(|| arr[i].as_integer().map(|v| v as f64));
    Some([at(0)?, at(1)?, at(2)?])
}

fn load_transforms(job: &JobConfig, base_dir: &Path) -> Result<Vec<GeometryTransform>> {
    let Some(file) = &job.geometry.transforms_file else {
        return Ok(Vec::new());
    };
    let path = base_dir.join(file);
    let transforms =
        read_transforms(&path).with_context(|| format!("Cannot read transforms from {}", path.display()))?;
    println!("  {} transform(s) from {}", transforms.len(), path.display());
    Ok(transforms)
}

fn load_point_sets(job: &JobConfig, base_dir: &Path) -> Result<Vec<EvaluationPoints>> {
    job.points
        .iter()
        .map(|set| -> Result<EvaluationPoints> {
            let rows = match &set.source {
                PointSource::File { file } => {
                    let path = base_dir.join(file);
                    read_points(&path)
                        .with_context(|| format!("Point set '{}': cannot read {}", set.label, path.display()))?
                        .0
                }
                PointSource::Inline { rows } => rows.clone(),
            };
            Ok(EvaluationPoints::from_rows(&set.label, &rows)?)
        })
        .collect()
}

fn build_substrate(
    job: &JobConfig,
    registry: &MaterialRegistry,
) -> Result<(Option<Box<dyn SubstrateSolver>>, Tolerances)> {
    match &job.substrate {
        None => Ok((None, Tolerances::default())),
        Some(SubstrateConfig::GroundPlane { image_cutoff }) => {
            let solver: Box<dyn SubstrateSolver> = Box::new(GroundPlane {
                image_cutoff: *image_cutoff,
            });
            Ok((Some(solver), Tolerances::default()))
        }
        Some(SubstrateConfig::HalfSpace {
            material,
            rel_tol,
            abs_tol,
            max_evals,
        }) => {
            let tolerances = Tolerances {
                rel_tol: *rel_tol,
                abs_tol: *abs_tol,
                max_evals: *max_evals,
            };
            let medium: Arc<_> = registry.get(material)?;
            let solver: Box<dyn SubstrateSolver> = Box::new(HalfSpace::new(medium));
            Ok((Some(solver), tolerances))
        }
    }
}

fn bloch_vectors(job: &JobConfig, ldim: usize) -> Result<Vec<Vec<f64>>> {
    let k_bloch = &job.simulation.k_bloch;
    if ldim == 0 {
        if !k_bloch.is_empty() {
            anyhow::bail!("Bloch vectors given, but the geometry has no lattice");
        }
        return Ok(vec![Vec::new()]);
    }
    if k_bloch.is_empty() {
        anyhow::bail!("Periodic geometry ({}D lattice) requires [simulation] k_bloch", ldim);
    }
    if let Some(bad) = k_bloch.iter().find(|k| k.len() != ldim) {
        anyhow::bail!(
            "Bloch vector {:?} has {} components; the lattice is {}D",
            bad,
            bad.len(),
            ldim
        );
    }
    Ok(k_bloch.clone())
}
