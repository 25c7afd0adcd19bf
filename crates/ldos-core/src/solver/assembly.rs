//! System-matrix assembly.
//!
//! The system matrix is partitioned into blocks, one per ordered surface
//! pair `(a, b)`; block rows start at `bf_offset(a)` and columns at
//! `bf_offset(b)`. Blocks come from a [`BlockProvider`]. For every unordered
//! pair only block `(a, b)` with `a < b` is assembled; block `(b, a)` is
//! derived from it by [`BlockProvider::reciprocal_block`], so the two are
//! related exactly by construction.
//!
//! How the matrix is filled is decided once per run by [`AssemblyStrategy`].

use std::time::Instant;

use ldos_geometry::{Geometry, GeometryTransform};
use ndarray::{s, Array2, ArrayView2};
use num_complex::Complex64;

use super::{BlockProvider, SolverError};
use crate::substrate::SubstrateSolver;

/// Dense square system matrix, allocated once and overwritten every call.
#[derive(Debug, Clone)]
pub struct SystemMatrix {
    data: Array2<Complex64>,
    offsets: Vec<usize>,
    sizes: Vec<usize>,
}

impl SystemMatrix {
    /// Allocate a zeroed matrix sized to the geometry's basis functions.
    pub fn new(geometry: &Geometry) -> Self {
        let n = geometry.total_basis_functions();
        let offsets = (0..geometry.num_surfaces()).map(|ns| geometry.bf_offset(ns)).collect();
        let sizes = geometry.surfaces().iter().map(|s| s.basis_functions()).collect();
        Self {
            data: Array2::zeros((n, n)),
            offsets,
            sizes,
        }
    }

    pub fn dim(&self) -> usize {
        self.data.nrows()
    }

    pub fn as_array(&self) -> &Array2<Complex64> {
        &self.data
    }

    /// View of block `(ns, nsp)`.
    pub fn block(&self, ns: usize, nsp: usize) -> ArrayView2<'_, Complex64> {
        let (r, c) = (self.offsets[ns], self.offsets[nsp]);
        self.data
            .slice(s![r..r + self.sizes[ns], c..c + self.sizes[nsp]])
    }

    /// Copy `block` into position `(ns, nsp)`.
    pub fn insert_block(
        &mut self,
        ns: usize,
        nsp: usize,
        block: &Array2<Complex64>,
    ) -> Result<(), SolverError> {
        let shape = (self.sizes[ns], self.sizes[nsp]);
        if block.dim() != shape {
            return Err(SolverError::LinAlgError(format!(
                "block ({}, {}) has shape {:?}, expected {:?}",
                ns,
                nsp,
                block.dim(),
                shape
            )));
        }
        let (r, c) = (self.offsets[ns], self.offsets[nsp]);
        self.data
            .slice_mut(s![r..r + shape.0, c..c + shape.1])
            .assign(block);
        Ok(())
    }
}

/// One cache token per unordered surface pair, owned by the caller.
///
/// The core never looks inside a token; it only routes the token of pair
/// `{a, b}` to every block call for that pair.
#[derive(Debug)]
pub struct BlockCaches<C> {
    tokens: Vec<C>,
}

impl<C: Default> BlockCaches<C> {
    /// Fresh tokens for every unordered pair of `geometry`.
    pub fn new(geometry: &Geometry) -> Self {
        Self {
            tokens: (0..geometry.num_surface_pairs()).map(|_| C::default()).collect(),
        }
    }
}

impl<C> BlockCaches<C> {
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Token of the unordered pair `{a, b}`.
    pub fn get_mut(&mut self, geometry: &Geometry, a: usize, b: usize) -> &mut C {
        &mut self.tokens[geometry.pair_index(a, b)]
    }
}

/// How the system matrix is produced, chosen once at setup.
pub enum AssemblyStrategy {
    /// No matrix; Green's functions come from an analytic substrate solver.
    Substrate(Box<dyn SubstrateSolver>),
    /// At most one transform: every unordered pair visited once per call.
    SingleTransform,
    /// Several transforms sharing one geometry: self blocks assembled once,
    /// off-diagonal blocks per transform.
    MultiTransform,
}

impl AssemblyStrategy {
    /// Pick the strategy for a run.
    pub fn select(
        substrate: Option<Box<dyn SubstrateSolver>>,
        num_transforms: usize,
    ) -> Result<Self, SolverError> {
        match substrate {
            Some(solver) if num_transforms > 1 => Err(SolverError::Configuration(format!(
                "{} transforms given, but substrate mode ({}) does not support transforms",
                num_transforms,
                solver.name()
            ))),
            Some(solver) => Ok(Self::Substrate(solver)),
            None if num_transforms > 1 => Ok(Self::MultiTransform),
            None => Ok(Self::SingleTransform),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Substrate(_) => "substrate",
            Self::SingleTransform => "single-transform",
            Self::MultiTransform => "multi-transform",
        }
    }
}

impl std::fmt::Debug for AssemblyStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Substrate(solver) => f.debug_tuple("Substrate").field(&solver.name()).finish(),
            other => f.write_str(other.name()),
        }
    }
}

/// Whether `ns` may copy the self block of its mate, given that both were
/// placed by `transform`.
fn reusable_mate<M: BlockProvider + ?Sized>(
    model: &M,
    geometry: &Geometry,
    transform: Option<&GeometryTransform>,
    ns: usize,
) -> Option<usize> {
    let mate = geometry.mate(ns)?;
    let unchanged = |s: usize| {
        transform
            .and_then(|t| t.motion_for(&geometry.surface(s).label))
            .map_or(true, |m| model.diagonal_block_invariant(m))
    };
    (unchanged(ns) && unchanged(mate)).then_some(mate)
}

/// Assemble the whole matrix by visiting each unordered pair once.
///
/// `transform` is the transform already applied to `geometry`, if any; it
/// decides whether mated surfaces can share a self block.
pub fn assemble_pairwise<M: BlockProvider + ?Sized>(
    model: &M,
    geometry: &Geometry,
    transform: Option<&GeometryTransform>,
    omega: Complex64,
    k_bloch: &[f64],
    matrix: &mut SystemMatrix,
    caches: &mut BlockCaches<M::Cache>,
) -> Result<(), SolverError> {
    let n = geometry.num_surfaces();
    for ns in 0..n {
        for nsp in ns..n {
            let start = Instant::now();
            if ns == nsp {
                if let Some(mate) = reusable_mate(model, geometry, transform, ns) {
                    let shared = matrix.block(mate, mate).to_owned();
                    matrix.insert_block(ns, ns, &shared)?;
                    log::debug!("Block ({ns},{ns}) copied from mate {mate}");
                    continue;
                }
            }
            let cache = caches.get_mut(geometry, ns, nsp);
            let block = model.assemble_block(geometry, ns, nsp, omega, k_bloch, cache)?;
            matrix.insert_block(ns, nsp, &block)?;
            if ns != nsp {
                let reverse =
                    model.reciprocal_block(geometry, ns, nsp, omega, k_bloch, &block, cache)?;
                matrix.insert_block(nsp, ns, &reverse)?;
            }
            log::debug!("Block ({ns},{nsp}) assembled in {:.2?}", start.elapsed());
        }
    }
    Ok(())
}

/// Single-transform assembly: one external call for aperiodic geometries,
/// pairwise with cache tokens for periodic ones.
pub fn assemble_single<M: BlockProvider + ?Sized>(
    model: &M,
    geometry: &Geometry,
    transform: Option<&GeometryTransform>,
    omega: Complex64,
    k_bloch: &[f64],
    matrix: &mut SystemMatrix,
    caches: &mut BlockCaches<M::Cache>,
) -> Result<(), SolverError> {
    if geometry.ldim() == 0 && transform.is_none() {
        model.assemble_whole_matrix(geometry, omega, matrix, caches)
    } else {
        assemble_pairwise(model, geometry, transform, omega, k_bloch, matrix, caches)
    }
}

/// Self blocks of the untransformed geometry, assembled once per call in
/// multi-transform mode. Mated surfaces hold no block of their own.
#[derive(Debug)]
pub struct DiagonalBlocks {
    blocks: Vec<Option<Array2<Complex64>>>,
}

impl DiagonalBlocks {
    pub fn assemble<M: BlockProvider + ?Sized>(
        model: &M,
        geometry: &Geometry,
        omega: Complex64,
        k_bloch: &[f64],
        caches: &mut BlockCaches<M::Cache>,
    ) -> Result<Self, SolverError> {
        let mut blocks = Vec::with_capacity(geometry.num_surfaces());
        for ns in 0..geometry.num_surfaces() {
            if geometry.mate(ns).is_some() {
                blocks.push(None);
                continue;
            }
            let cache = caches.get_mut(geometry, ns, ns);
            blocks.push(Some(model.assemble_block(geometry, ns, ns, omega, k_bloch, cache)?));
        }
        Ok(Self { blocks })
    }

    /// Stored self block of `ns`, following the mate relation.
    pub fn get(&self, geometry: &Geometry, ns: usize) -> Option<&Array2<Complex64>> {
        let owner = geometry.mate(ns).unwrap_or(ns);
        self.blocks[owner].as_ref()
    }
}

/// Fill the matrix for one transform in multi-transform mode.
///
/// `geometry` is already transformed by `transform`. Self blocks come from
/// `diagonals` unless the transform moves the surface in a way the provider
/// does not declare invariant, or reuse is disabled; everything else is
/// assembled with `caches`, which must belong to this transform.
#[allow(clippy::too_many_arguments)]
pub fn assemble_transformed<M: BlockProvider + ?Sized>(
    model: &M,
    geometry: &Geometry,
    transform: &GeometryTransform,
    diagonals: Option<&DiagonalBlocks>,
    omega: Complex64,
    k_bloch: &[f64],
    matrix: &mut SystemMatrix,
    caches: &mut BlockCaches<M::Cache>,
) -> Result<(), SolverError> {
    let n = geometry.num_surfaces();
    for ns in 0..n {
        let invariant = transform
            .motion_for(&geometry.surface(ns).label)
            .map_or(true, |m| model.diagonal_block_invariant(m));
        match diagonals.and_then(|d| d.get(geometry, ns)) {
            Some(block) if invariant => matrix.insert_block(ns, ns, block)?,
            _ => {
                let cache = caches.get_mut(geometry, ns, ns);
                let block = model.assemble_block(geometry, ns, ns, omega, k_bloch, cache)?;
                matrix.insert_block(ns, ns, &block)?;
            }
        }
    }

    for ns in 0..n {
        for nsp in ns + 1..n {
            let cache = caches.get_mut(geometry, ns, nsp);
            let block = model.assemble_block(geometry, ns, nsp, omega, k_bloch, cache)?;
            let reverse = model.reciprocal_block(geometry, ns, nsp, omega, k_bloch, &block, cache)?;
            matrix.insert_block(ns, nsp, &block)?;
            matrix.insert_block(nsp, ns, &reverse)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ldos_geometry::{RigidMotion, Surface};
    use std::cell::Cell;

    /// Block entries encode the surface pair and the current node positions.
    #[derive(Default)]
    struct Probe {
        calls: Cell<usize>,
    }

    impl BlockProvider for Probe {
        type Cache = usize;

        fn assemble_block(
            &self,
            geometry: &Geometry,
            a: usize,
            b: usize,
            omega: Complex64,
            _k_bloch: &[f64],
            cache: &mut usize,
        ) -> Result<Array2<Complex64>, SolverError> {
            self.calls.set(self.calls.get() + 1);
            *cache += 1;
            let (sa, sb) = (geometry.surface(a), geometry.surface(b));
            Ok(Array2::from_shape_fn(
                (sa.basis_functions(), sb.basis_functions()),
                |(i, j)| {
                    let pa = sa.nodes[i / 3];
                    let pb = sb.nodes[j / 3];
                    Complex64::new(
                        omega.re + (pa[0] - pb[0]) * (i + 1) as f64,
                        omega.im + (pa[1] - pb[1]) * (j + 1) as f64,
                    )
                },
            ))
        }

        fn diagonal_block_invariant(&self, motion: &RigidMotion) -> bool {
            motion.is_translation()
        }
    }

    fn geometry() -> Geometry {
        Geometry::new(
            vec![
                Surface::new("a", "Au", vec![[0.0, 0.0, 0.0], [0.1, 0.0, 0.0]]),
                Surface::new("b", "Au", vec![[0.0, 1.0, 0.0], [0.1, 1.0, 0.0]]),
                Surface::new("c", "Ag", vec![[2.0, 0.0, 0.0]]),
            ],
            None,
        )
        .unwrap()
    }

    #[test]
    fn test_insert_block_checks_shape() {
        let g = geometry();
        let mut m = SystemMatrix::new(&g);
        assert_eq!(m.dim(), 15);
        assert!(m.insert_block(0, 2, &Array2::zeros((6, 3))).is_ok());
        assert!(matches!(
            m.insert_block(0, 2, &Array2::zeros((3, 6))),
            Err(SolverError::LinAlgError(_))
        ));
    }

    #[test]
    fn test_pairwise_blocks_are_exact_adjoints() {
        let g = geometry();
        let model = Probe::default();
        let mut m = SystemMatrix::new(&g);
        let mut caches = BlockCaches::new(&g);
        assemble_pairwise(&model, &g, None, Complex64::new(1.5, 0.1), &[], &mut m, &mut caches)
            .unwrap();
        for a in 0..3 {
            for b in 0..3 {
                if a != b {
                    let ab = m.block(a, b);
                    let ba = m.block(b, a);
                    assert_eq!(ba, ab.t().mapv(|z| z.conj()));
                }
            }
        }
        // "b" is a mate of "a": five unordered pairs assembled, one self block copied.
        assert_eq!(model.calls.get(), 5);
        assert_eq!(m.block(1, 1), m.block(0, 0));
        assert_eq!(caches.len(), 6);
    }

    #[test]
    fn test_rotated_mate_gets_its_own_block() {
        let mut g = geometry();
        let model = Probe::default();
        let mut m = SystemMatrix::new(&g);
        let mut caches = BlockCaches::new(&g);
        let t = GeometryTransform::new("rot")
            .with_motion("b", RigidMotion::rotation_about([0.0, 0.0, 1.0], 90.0).unwrap());
        let moved = g.apply_transform(&t).unwrap();
        assemble_single(&model, &moved, Some(&t), Complex64::new(1.0, 0.0), &[], &mut m, &mut caches)
            .unwrap();
        assert_eq!(model.calls.get(), 6);
    }

    #[test]
    fn test_transformed_assembly_matches_fresh_assembly() {
        let mut g = geometry();
        let model = Probe::default();
        let omega = Complex64::new(2.0, 0.0);
        let mut caches = BlockCaches::new(&g);
        let diagonals = DiagonalBlocks::assemble(&model, &g, omega, &[], &mut caches).unwrap();

        let transforms = [
            GeometryTransform::new("shift")
                .with_motion("c", RigidMotion::translation(0.0, 0.5, 0.0)),
            GeometryTransform::new("turn")
                .with_motion("a", RigidMotion::rotation_about([0.0, 0.0, 1.0], 45.0).unwrap()),
        ];
        for t in &transforms {
            let moved = g.apply_transform(t).unwrap();
            let mut reused = SystemMatrix::new(&moved);
            let mut fresh = SystemMatrix::new(&moved);
            let mut c1 = BlockCaches::new(&moved);
            let mut c2 = BlockCaches::new(&moved);
            assemble_transformed(&model, &moved, t, Some(&diagonals), omega, &[], &mut reused, &mut c1)
                .unwrap();
            assemble_transformed(&model, &moved, t, None, omega, &[], &mut fresh, &mut c2).unwrap();
            assert_eq!(reused.as_array(), fresh.as_array(), "transform {}", t.tag);
        }
    }

    #[test]
    fn test_strategy_selection() {
        assert!(matches!(AssemblyStrategy::select(None, 0), Ok(AssemblyStrategy::SingleTransform)));
        assert!(matches!(AssemblyStrategy::select(None, 1), Ok(AssemblyStrategy::SingleTransform)));
        assert!(matches!(AssemblyStrategy::select(None, 4), Ok(AssemblyStrategy::MultiTransform)));
    }
}
