//! Evaluation of the LDOS at one `(Omega, kBloch)` point.
//!
//! [`LdosSolver`] owns everything fixed for a run (geometry, scattering
//! model, assembly strategy, transforms, point sets, options) and exposes one
//! operation, [`LdosSolver::evaluate`], which runs
//! transform, assemble, factorize, Green's functions and reduce for every
//! configured transform and point set.

use std::time::Instant;

use ldos_geometry::{Geometry, GeometryTransform};
use num_complex::Complex64;

use crate::ldos::{reduce_errors_into, reduce_into};
use crate::solver::assembly::{
    assemble_single, assemble_transformed, AssemblyStrategy, BlockCaches, DiagonalBlocks,
    SystemMatrix,
};
use crate::solver::direct::FactoredMatrix;
use crate::solver::{BlockProvider, GreensFunctionEvaluator, SolverError};
use crate::substrate::{SubstrateRequest, SubstrateSolver};
use crate::types::{EvaluationPoints, LdosOptions, LdosResults};

/// Per-run state of an LDOS computation.
pub struct LdosSolver<M: BlockProvider + GreensFunctionEvaluator> {
    geometry: Geometry,
    model: M,
    strategy: AssemblyStrategy,
    transforms: Vec<GeometryTransform>,
    point_sets: Vec<EvaluationPoints>,
    options: LdosOptions,
    matrix: SystemMatrix,
}

impl<M: BlockProvider + GreensFunctionEvaluator> LdosSolver<M> {
    /// Validate the run configuration and choose the assembly strategy.
    ///
    /// An empty `transforms` list means the identity transform `DEFAULT`.
    /// With a `substrate` solver the geometry must hold no surfaces.
    pub fn new(
        geometry: Geometry,
        model: M,
        substrate: Option<Box<dyn SubstrateSolver>>,
        transforms: Vec<GeometryTransform>,
        point_sets: Vec<EvaluationPoints>,
        options: LdosOptions,
    ) -> Result<Self, SolverError> {
        match &substrate {
            Some(solver) if geometry.num_surfaces() > 0 => {
                return Err(SolverError::Configuration(format!(
                    "substrate mode ({}) takes no scattering surfaces, got {}",
                    solver.name(),
                    geometry.num_surfaces()
                )));
            }
            None if geometry.num_surfaces() == 0 => {
                return Err(SolverError::Configuration(
                    "geometry has no surfaces and no substrate is configured".into(),
                ));
            }
            _ => {}
        }
        if point_sets.is_empty() {
            return Err(SolverError::Configuration("no evaluation-point sets given".into()));
        }
        for (i, set) in point_sets.iter().enumerate() {
            if point_sets[..i].iter().any(|s| s.label == set.label) {
                return Err(SolverError::Configuration(format!(
                    "duplicate point-set label '{}'",
                    set.label
                )));
            }
        }

        let strategy = AssemblyStrategy::select(substrate, transforms.len())?;
        let transforms = if transforms.is_empty() {
            vec![GeometryTransform::identity()]
        } else {
            transforms
        };
        for (i, t) in transforms.iter().enumerate() {
            t.validate(&geometry)?;
            if transforms[..i].iter().any(|u| u.tag == t.tag) {
                return Err(SolverError::Configuration(format!(
                    "duplicate transform tag '{}'",
                    t.tag
                )));
            }
        }

        log::info!(
            "LDOS solver: {} surfaces, {} basis functions, {} transform(s), {} point set(s), {} assembly",
            geometry.num_surfaces(),
            geometry.total_basis_functions(),
            transforms.len(),
            point_sets.len(),
            strategy.name()
        );

        let matrix = SystemMatrix::new(&geometry);
        Ok(Self {
            geometry,
            model,
            strategy,
            transforms,
            point_sets,
            options,
            matrix,
        })
    }

    /// Fresh cache tokens, one per unordered surface pair. The caller keeps
    /// them across calls so providers can reuse work between Bloch vectors.
    pub fn new_caches(&self) -> BlockCaches<M::Cache> {
        BlockCaches::new(&self.geometry)
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn strategy(&self) -> &AssemblyStrategy {
        &self.strategy
    }

    pub fn transforms(&self) -> &[GeometryTransform] {
        &self.transforms
    }

    pub fn transform_tags(&self) -> Vec<String> {
        self.transforms.iter().map(|t| t.tag.clone()).collect()
    }

    pub fn point_sets(&self) -> &[EvaluationPoints] {
        &self.point_sets
    }

    pub fn options(&self) -> &LdosOptions {
        &self.options
    }

    /// Values per point in the result buffer.
    pub fn stride(&self) -> usize {
        self.options.stride()
    }

    /// Evaluate every transform and point set at `(omega, k_bloch)`.
    ///
    /// `k_bloch` must have one component per periodic dimension (none for
    /// compact geometries). The geometry is back in its original state when
    /// this returns, whatever the outcome.
    pub fn evaluate(
        &mut self,
        caches: &mut BlockCaches<M::Cache>,
        omega: Complex64,
        k_bloch: &[f64],
    ) -> Result<LdosResults, SolverError> {
        let ldim = self.geometry.ldim();
        if k_bloch.len() != ldim {
            return Err(SolverError::Configuration(format!(
                "Bloch vector has {} components, geometry is {}-periodic",
                k_bloch.len(),
                ldim
            )));
        }
        if caches.len() != self.geometry.num_surface_pairs() {
            return Err(SolverError::Configuration(format!(
                "{} cache tokens given for {} surface pairs",
                caches.len(),
                self.geometry.num_surface_pairs()
            )));
        }
        match k_bloch {
            [] => log::info!("Computing LDOS at Omega={}", omega),
            [kx] => log::info!("Computing LDOS at (Omega,kx)=({},{})", omega, kx),
            [kx, ky, ..] => log::info!("Computing LDOS at (Omega,kx,ky)=({},{},{})", omega, kx, ky),
        }

        let set_sizes = self.point_sets.iter().map(EvaluationPoints::len).collect();
        let mut results = LdosResults::zeros(self.stride(), self.transforms.len(), set_sizes);
        let start = Instant::now();

        match &self.strategy {
            AssemblyStrategy::Substrate(solver) => {
                self.evaluate_substrate(solver.as_ref(), omega, k_bloch, &mut results)?;
            }
            AssemblyStrategy::SingleTransform => {
                let transform = &self.transforms[0];
                let moved = self.geometry.apply_transform(transform)?;
                let applied = (!transform.motions.is_empty()).then_some(transform);
                assemble_single(&self.model, &moved, applied, omega, k_bloch, &mut self.matrix, caches)?;
                let factored = factorize(&self.matrix, omega, k_bloch, &transform.tag)?;
                reduce_sets(
                    &self.model,
                    &moved,
                    &self.point_sets,
                    &self.options,
                    omega,
                    k_bloch,
                    &factored,
                    0,
                    &mut results,
                )?;
            }
            AssemblyStrategy::MultiTransform => {
                let diagonals = if self.options.reuse_diagonal_blocks {
                    Some(DiagonalBlocks::assemble(&self.model, &self.geometry, omega, k_bloch, caches)?)
                } else {
                    None
                };
                for (t, transform) in self.transforms.iter().enumerate() {
                    log::info!("Working at transformation {}...", transform.tag);
                    let moved = self.geometry.apply_transform(transform)?;
                    let mut local = BlockCaches::new(&moved);
                    assemble_transformed(
                        &self.model,
                        &moved,
                        transform,
                        diagonals.as_ref(),
                        omega,
                        k_bloch,
                        &mut self.matrix,
                        &mut local,
                    )?;
                    let factored = factorize(&self.matrix, omega, k_bloch, &transform.tag)?;
                    reduce_sets(
                        &self.model,
                        &moved,
                        &self.point_sets,
                        &self.options,
                        omega,
                        k_bloch,
                        &factored,
                        t,
                        &mut results,
                    )?;
                }
            }
        }

        log::debug!("Evaluation finished in {:.2?}", start.elapsed());
        Ok(results)
    }

    fn evaluate_substrate(
        &self,
        solver: &dyn SubstrateSolver,
        omega: Complex64,
        k_bloch: &[f64],
        results: &mut LdosResults,
    ) -> Result<(), SolverError> {
        for (set, points) in self.point_sets.iter().enumerate() {
            let request = SubstrateRequest {
                points,
                omega,
                k_bloch,
                lattice: self.geometry.lattice(),
                tolerances: self.options.tolerances,
                scattering_only: self.options.scattering_only,
            };
            let dgfs = solver.substrate_dgfs(&request)?;
            reduce_into(omega, dgfs.values.view(), self.options.ldos_only, results.slice_mut(0, set))?;
            if let Some(errors) = &dgfs.errors {
                reduce_errors_into(omega, errors, self.options.ldos_only, results.error_slice_mut(0, set))?;
            }
        }
        Ok(())
    }
}

impl<M: BlockProvider + GreensFunctionEvaluator> std::fmt::Debug for LdosSolver<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LdosSolver")
            .field("surfaces", &self.geometry.num_surfaces())
            .field("strategy", &self.strategy)
            .field("transforms", &self.transform_tags())
            .field("point_sets", &self.point_sets.len())
            .finish()
    }
}

/// Factorize, attaching the evaluation identity to a singular matrix.
fn factorize(
    matrix: &SystemMatrix,
    omega: Complex64,
    k_bloch: &[f64],
    tag: &str,
) -> Result<FactoredMatrix, SolverError> {
    matrix.factorize().map_err(|e| match e {
        SolverError::LinAlgError(message) => {
            log::debug!("LU factorization failed: {}", message);
            SolverError::SingularMatrix {
                omega,
                k_bloch: k_bloch.to_vec(),
                transform: tag.to_string(),
            }
        }
        other => other,
    })
}

#[allow(clippy::too_many_arguments)]
fn reduce_sets<M: GreensFunctionEvaluator>(
    model: &M,
    geometry: &Geometry,
    point_sets: &[EvaluationPoints],
    options: &LdosOptions,
    omega: Complex64,
    k_bloch: &[f64],
    factored: &FactoredMatrix,
    transform: usize,
    results: &mut LdosResults,
) -> Result<(), SolverError> {
    for (set, points) in point_sets.iter().enumerate() {
        if points.is_empty() {
            continue;
        }
        let gfs = model.dyadic_gfs(geometry, omega, k_bloch, points, factored, options.scattering_only)?;
        reduce_into(omega, gfs.view(), options.ldos_only, results.slice_mut(transform, set))?;
    }
    Ok(())
}
