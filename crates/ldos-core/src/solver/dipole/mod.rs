//! Coupled-dipole scattering model.
//!
//! Each surface node is a polarisable point standing for a cubic cell of
//! side `d`. The $3\times3$ block between nodes $i$ and $j$ of the system
//! matrix is
//!
//! - $\alpha_i^{-1}\mathbf{I}$ on the diagonal,
//! - $-\sum_{\mathbf{L}} \mathbf{G}(\mathbf{r}_i, \mathbf{r}_j + \mathbf{L})\,e^{i\mathbf{k}\cdot\mathbf{L}}$
//!   otherwise, the sum running over lattice images (only $\mathbf{L} = 0$
//!   for compact geometries, and skipping the coincident term).
//!
//! For a fixed frequency the image blocks do not depend on the Bloch vector,
//! so they are kept in the pair's cache token and recombined with new phases
//! for every `kBloch`. Since $\mathbf{G}$ is symmetric, block $(b, a)$ at
//! $\mathbf{k}$ is the transpose of block $(a, b)$ at $-\mathbf{k}$.

pub mod greens;
pub mod polarisability;

use std::sync::Arc;

use ldos_geometry::{Geometry, RigidMotion, Surface};
use ldos_materials::{MaterialProvider, MaterialRegistry};
use ndarray::{s, Array2};
use num_complex::Complex64;
use rayon::prelude::*;

use self::greens::{
    bloch_factor, cartesian_bloch, curl_greens_tensor, dyadic_greens_tensor, lattice_sum,
    self_term, Tensor3x3,
};
use self::polarisability::{clausius_mossotti, radiative_correction};
use super::direct::FactoredMatrix;
use super::{BlockProvider, GreensFunctionEvaluator, SolverError};
use crate::types::EvaluationPoints;

/// Default number of lattice images per direction on each side.
pub const DEFAULT_IMAGE_CUTOFF: usize = 4;

/// Material and cell volume of one surface.
#[derive(Clone)]
pub struct SurfaceMedium {
    pub material: Arc<dyn MaterialProvider>,
    /// Volume represented by each node (μm³).
    pub cell_volume: f64,
}

impl std::fmt::Debug for SurfaceMedium {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SurfaceMedium")
            .field("material", &self.material.name())
            .field("cell_volume", &self.cell_volume)
            .finish()
    }
}

/// Real-space block for one lattice image.
#[derive(Debug, Clone)]
struct ImageBlock {
    shift: [f64; 3],
    block: Array2<Complex64>,
}

/// What a cached set of image blocks was computed for. Node positions are
/// compared exactly, so any motion of either surface invalidates the entry.
#[derive(Debug, Clone, PartialEq)]
struct CacheKey {
    omega: Complex64,
    pair: (usize, usize),
    nodes: [Vec<[f64; 3]>; 2],
}

impl CacheKey {
    fn matches(&self, omega: Complex64, pair: (usize, usize), sa: &Surface, sb: &Surface) -> bool {
        self.omega == omega
            && self.pair == pair
            && self.nodes[0] == sa.nodes
            && self.nodes[1] == sb.nodes
    }
}

/// Per-pair cache: the image blocks at the last frequency seen.
#[derive(Debug, Default)]
pub struct PairCache {
    key: Option<CacheKey>,
    images: Vec<ImageBlock>,
}

impl PairCache {
    /// True once the pair has been assembled at least once.
    pub fn is_filled(&self) -> bool {
        self.key.is_some()
    }
}

/// Coupled-dipole block provider and Green's-function evaluator.
#[derive(Debug, Clone)]
pub struct DipoleClusterModel {
    media: Vec<SurfaceMedium>,
    image_cutoff: usize,
}

impl DipoleClusterModel {
    /// Model for `geometry`, resolving each surface's material in `registry`.
    /// `spacings[ns]` is the node spacing of surface `ns` (μm).
    pub fn new(
        geometry: &Geometry,
        registry: &MaterialRegistry,
        spacings: &[f64],
    ) -> Result<Self, SolverError> {
        if spacings.len() != geometry.num_surfaces() {
            return Err(SolverError::Configuration(format!(
                "{} node spacings given for {} surfaces",
                spacings.len(),
                geometry.num_surfaces()
            )));
        }
        let media = geometry
            .surfaces()
            .iter()
            .zip(spacings)
            .map(|(surface, &d)| {
                if d <= 0.0 {
                    return Err(SolverError::Configuration(format!(
                        "surface '{}' has non-positive spacing {}",
                        surface.label, d
                    )));
                }
                Ok(SurfaceMedium {
                    material: registry.get(&surface.material)?,
                    cell_volume: d * d * d,
                })
            })
            .collect::<Result<Vec<_>, SolverError>>()?;
        Ok(Self::from_media(media))
    }

    pub fn from_media(media: Vec<SurfaceMedium>) -> Self {
        Self {
            media,
            image_cutoff: DEFAULT_IMAGE_CUTOFF,
        }
    }

    pub fn with_image_cutoff(mut self, image_cutoff: usize) -> Self {
        self.image_cutoff = image_cutoff;
        self
    }

    pub fn image_cutoff(&self) -> usize {
        self.image_cutoff
    }

    /// Inverse polarisability of every node of surface `ns`.
    pub fn inverse_polarisability(&self, ns: usize, omega: Complex64) -> Result<Complex64, SolverError> {
        let medium = self.media.get(ns).ok_or_else(|| {
            SolverError::Configuration(format!("no material for surface {}", ns))
        })?;
        let eps = medium.material.permittivity(omega)?;
        let alpha = radiative_correction(
            clausius_mossotti(medium.cell_volume, eps, Complex64::new(1.0, 0.0)),
            omega,
        );
        Ok(1.0 / alpha)
    }

    fn images(&self, geometry: &Geometry) -> Vec<[f64; 3]> {
        geometry
            .lattice()
            .map_or_else(|| vec![[0.0; 3]], |l| l.images(self.image_cutoff))
    }

    /// Refresh `cache` for pair `(a, b)` at `omega` if it is stale.
    fn refresh<'c>(
        &self,
        geometry: &Geometry,
        a: usize,
        b: usize,
        omega: Complex64,
        cache: &'c mut PairCache,
    ) -> Result<&'c [ImageBlock], SolverError> {
        let (sa, sb) = (geometry.surface(a), geometry.surface(b));
        let fresh = cache
            .key
            .as_ref()
            .map_or(false, |key| key.matches(omega, (a, b), sa, sb));
        if !fresh {
            let self_inverse = if a == b {
                Some(self.inverse_polarisability(a, omega)?)
            } else {
                None
            };
            cache.images = self
                .images(geometry)
                .into_iter()
                .map(|shift| ImageBlock {
                    block: image_block(sa, sb, &shift, omega, self_inverse),
                    shift,
                })
                .collect();
            cache.key = Some(CacheKey {
                omega,
                pair: (a, b),
                nodes: [sa.nodes.clone(), sb.nodes.clone()],
            });
            log::trace!("Pair ({a},{b}): {} image blocks computed", cache.images.len());
        }
        Ok(&cache.images)
    }
}

/// Real-space block between surfaces for one image shift `L`:
/// $-\mathbf{G}(\mathbf{r}_i, \mathbf{r}_j + \mathbf{L})$ per node pair, with
/// $\alpha^{-1}\mathbf{I}$ in place of the coincident term.
fn image_block(
    sa: &Surface,
    sb: &Surface,
    shift: &[f64; 3],
    k: Complex64,
    self_inverse: Option<Complex64>,
) -> Array2<Complex64> {
    let nb = sb.nodes.len();
    let strips: Vec<Vec<Complex64>> = sa
        .nodes
        .par_iter()
        .map(|ri| {
            let mut strip = vec![Complex64::new(0.0, 0.0); 9 * nb];
            for (j, rj) in sb.nodes.iter().enumerate() {
                let src = [rj[0] + shift[0], rj[1] + shift[1], rj[2] + shift[2]];
                match dyadic_greens_tensor(ri, &src, k) {
                    Some(g) => {
                        for r in 0..3 {
                            for c in 0..3 {
                                strip[r * 3 * nb + 3 * j + c] = -g[r][c];
                            }
                        }
                    }
                    None => {
                        if let Some(inv) = self_inverse {
                            for r in 0..3 {
                                strip[r * 3 * nb + 3 * j + r] = inv;
                            }
                        }
                    }
                }
            }
            strip
        })
        .collect();

    let mut block = Array2::zeros((3 * sa.nodes.len(), 3 * nb));
    for (i, strip) in strips.iter().enumerate() {
        for r in 0..3 {
            block
                .row_mut(3 * i + r)
                .iter_mut()
                .zip(&strip[r * 3 * nb..(r + 1) * 3 * nb])
                .for_each(|(dst, src)| *dst = *src);
        }
    }
    block
}

impl BlockProvider for DipoleClusterModel {
    type Cache = PairCache;

    fn assemble_block(
        &self,
        geometry: &Geometry,
        a: usize,
        b: usize,
        omega: Complex64,
        k_bloch: &[f64],
        cache: &mut PairCache,
    ) -> Result<Array2<Complex64>, SolverError> {
        let k_cart = cartesian_bloch(geometry.lattice(), k_bloch);
        let images = self.refresh(geometry, a, b, omega, cache)?;
        let (rows, cols) = images[0].block.dim();
        let mut block = Array2::zeros((rows, cols));
        for image in images {
            let phase = bloch_factor(&k_cart, &image.shift);
            block.scaled_add(phase, &image.block);
        }
        Ok(block)
    }

    fn reciprocal_block(
        &self,
        geometry: &Geometry,
        a: usize,
        b: usize,
        omega: Complex64,
        k_bloch: &[f64],
        _forward: &Array2<Complex64>,
        cache: &mut PairCache,
    ) -> Result<Array2<Complex64>, SolverError> {
        let k_cart = cartesian_bloch(geometry.lattice(), k_bloch);
        let images = self.refresh(geometry, a, b, omega, cache)?;
        let (rows, cols) = images[0].block.dim();
        let mut block = Array2::zeros((cols, rows));
        for image in images {
            let phase = bloch_factor(&k_cart, &image.shift).conj();
            block.scaled_add(phase, &image.block.t());
        }
        Ok(block)
    }

    fn diagonal_block_invariant(&self, motion: &RigidMotion) -> bool {
        motion.is_translation()
    }
}

/// All nodes of the geometry in basis-function order.
fn all_nodes(geometry: &Geometry) -> Vec<[f64; 3]> {
    geometry
        .surfaces()
        .iter()
        .flat_map(|s| s.nodes.iter().copied())
        .collect()
}

fn add_tensor(dst: &mut Tensor3x3, src: &Tensor3x3) {
    for i in 0..3 {
        for j in 0..3 {
            dst[i][j] += src[i][j];
        }
    }
}

impl GreensFunctionEvaluator for DipoleClusterModel {
    fn dyadic_gfs(
        &self,
        geometry: &Geometry,
        omega: Complex64,
        k_bloch: &[f64],
        points: &EvaluationPoints,
        factored: &FactoredMatrix,
        scattering_only: bool,
    ) -> Result<Array2<Complex64>, SolverError> {
        let k = omega;
        let images = self.images(geometry);
        let k_cart = cartesian_bloch(geometry.lattice(), k_bloch);
        let nodes = all_nodes(geometry);
        let dim = 3 * nodes.len();
        if dim != factored.dim() {
            return Err(SolverError::LinAlgError(format!(
                "factored matrix has dimension {}, geometry has {} basis functions",
                factored.dim(),
                dim
            )));
        }
        let npoints = points.len();

        // Incident fields at the nodes: columns 6p..6p+3 from an electric
        // source at x'_p, columns 6p+3..6p+6 from a magnetic one.
        let columns: Vec<(Vec<Tensor3x3>, Vec<Tensor3x3>)> = (0..npoints)
            .into_par_iter()
            .map(|p| {
                let src = points.source(p);
                let (electric, magnetic): (Vec<Tensor3x3>, Vec<Tensor3x3>) = nodes
                    .iter()
                    .map(|rj| {
                        let (e, _) =
                            lattice_sum(dyadic_greens_tensor, rj, &src, k, &images, &k_cart);
                        let (m, _) =
                            lattice_sum(curl_greens_tensor, rj, &src, k, &images, &k_cart);
                        (e, m)
                    })
                    .unzip();
                (electric, magnetic)
            })
            .collect();

        let mut rhs = Array2::<Complex64>::zeros((dim, 6 * npoints));
        for (p, (electric, magnetic)) in columns.iter().enumerate() {
            for j in 0..nodes.len() {
                for r in 0..3 {
                    for c in 0..3 {
                        rhs[[3 * j + r, 6 * p + c]] = electric[j][r][c];
                        rhs[[3 * j + r, 6 * p + 3 + c]] = -magnetic[j][r][c];
                    }
                }
            }
        }
        let moments = factored.solve(&rhs)?;

        let rows: Vec<[Complex64; 18]> = (0..npoints)
            .into_par_iter()
            .map(|p| {
                let (x, src) = (points.observation(p), points.source(p));
                let mut ge = greens::ZERO_TENSOR;
                if !scattering_only {
                    let (free, coincident) =
                        lattice_sum(dyadic_greens_tensor, &x, &src, k, &images, &k_cart);
                    ge = free;
                    if coincident {
                        for d in 0..3 {
                            ge[d][d] += self_term(k);
                        }
                    }
                }
                // Free-space magnetic response equals the electric one.
                let mut gm = ge;

                let pe = moments.slice(s![.., 6 * p..6 * p + 3]);
                let pm = moments.slice(s![.., 6 * p + 3..6 * p + 6]);
                for (i, ri) in nodes.iter().enumerate() {
                    let (g, _) = lattice_sum(dyadic_greens_tensor, &x, ri, k, &images, &k_cart);
                    let (c, _) = lattice_sum(curl_greens_tensor, &x, ri, k, &images, &k_cart);
                    let mut scattered_e = greens::ZERO_TENSOR;
                    let mut scattered_m = greens::ZERO_TENSOR;
                    for mu in 0..3 {
                        for nu in 0..3 {
                            for l in 0..3 {
                                scattered_e[mu][nu] += g[mu][l] * pe[[3 * i + l, nu]];
                                scattered_m[mu][nu] += c[mu][l] * pm[[3 * i + l, nu]];
                            }
                        }
                    }
                    add_tensor(&mut ge, &scattered_e);
                    add_tensor(&mut gm, &scattered_m);
                }

                let mut row = [Complex64::new(0.0, 0.0); 18];
                for mu in 0..3 {
                    for nu in 0..3 {
                        row[3 * mu + nu] = ge[mu][nu];
                        row[9 + 3 * mu + nu] = gm[mu][nu];
                    }
                }
                row
            })
            .collect();

        let mut out = Array2::zeros((npoints, 18));
        for (p, row) in rows.iter().enumerate() {
            for (q, value) in row.iter().enumerate() {
                out[[p, q]] = *value;
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::assembly::{assemble_pairwise, BlockCaches, SystemMatrix};
    use ldos_geometry::Lattice;
    use ldos_materials::analytic::ConstantMaterial;
    use ndarray::array;

    fn model(n: usize, eps: Complex64) -> DipoleClusterModel {
        let medium = SurfaceMedium {
            material: Arc::new(ConstantMaterial::new("test", eps)),
            cell_volume: 1e-3,
        };
        DipoleClusterModel::from_media(vec![medium; n]).with_image_cutoff(2)
    }

    fn pair_geometry(lattice: Option<Lattice>) -> Geometry {
        Geometry::new(
            vec![
                Surface::new("a", "m", vec![[0.0, 0.0, 0.0], [0.1, 0.0, 0.0]]),
                Surface::new("b", "m", vec![[0.05, 0.3, 0.1]]),
            ],
            lattice,
        )
        .unwrap()
    }

    #[test]
    fn test_aperiodic_matrix_is_symmetric() {
        let g = pair_geometry(None);
        let m = model(2, Complex64::new(-5.0, 0.8));
        let mut matrix = SystemMatrix::new(&g);
        let mut caches = BlockCaches::new(&g);
        assemble_pairwise(&m, &g, None, Complex64::new(6.0, 0.0), &[], &mut matrix, &mut caches)
            .unwrap();
        let a = matrix.as_array();
        assert_eq!(a, &a.t().to_owned());
    }

    #[test]
    fn test_periodic_reciprocal_block_flips_bloch_vector() {
        let g = pair_geometry(Some(Lattice::square(0.5).unwrap()));
        let m = model(2, Complex64::new(-5.0, 0.8));
        let omega = Complex64::new(6.0, 0.0);
        let k = [1.3, -0.4];
        let minus_k = [-1.3, 0.4];

        let mut cache = PairCache::default();
        let forward = m.assemble_block(&g, 0, 1, omega, &k, &mut cache).unwrap();
        let reverse = m.reciprocal_block(&g, 0, 1, omega, &k, &forward, &mut cache).unwrap();
        let forward_minus = m.assemble_block(&g, 0, 1, omega, &minus_k, &mut cache).unwrap();

        for ((i, j), value) in reverse.indexed_iter() {
            let expected = forward_minus[[j, i]];
            assert!((value - expected).norm() < 1e-9 * expected.norm().max(1.0));
        }

        // The direct (b, a) block agrees with the reciprocal construction.
        let mut other = PairCache::default();
        let direct = m.assemble_block(&g, 1, 0, omega, &k, &mut other).unwrap();
        for (x, y) in direct.iter().zip(reverse.iter()) {
            assert!((x - y).norm() < 1e-9 * y.norm().max(1.0));
        }
    }

    #[test]
    fn test_cache_survives_bloch_vector_change() {
        let g = pair_geometry(Some(Lattice::new(vec![[0.4, 0.0, 0.0]]).unwrap()));
        let m = model(2, Complex64::new(2.0, 0.1));
        let omega = Complex64::new(3.0, 0.0);
        let mut cache = PairCache::default();
        assert!(!cache.is_filled());

        let first = m.assemble_block(&g, 0, 0, omega, &[0.0], &mut cache).unwrap();
        assert!(cache.is_filled());
        assert_eq!(cache.images.len(), 5);
        let key = cache.key.clone();
        m.assemble_block(&g, 0, 0, omega, &[1.0], &mut cache).unwrap();
        assert_eq!(cache.key, key);
        let again = m.assemble_block(&g, 0, 0, omega, &[0.0], &mut cache).unwrap();
        assert_eq!(first, again);
    }

    #[test]
    fn test_cache_refreshes_when_anchor_nodes_stay_put() {
        let mut g = Geometry::new(
            vec![
                Surface::new("a", "m", vec![[0.0, 0.0, 0.0], [0.0, 0.1, 0.0]]),
                Surface::new("b", "m", vec![[0.3, 0.0, 0.0], [0.3, 0.05, 0.05]]),
            ],
            Some(Lattice::new(vec![[1.0, 0.0, 0.0]]).unwrap()),
        )
        .unwrap();
        let m = model(2, Complex64::new(-4.0, 0.6));
        let omega = Complex64::new(5.0, 0.0);
        let mut cache = PairCache::default();
        let before = m.assemble_block(&g, 0, 1, omega, &[0.5], &mut cache).unwrap();

        // Rotating about the x-axis leaves the first node of each surface fixed.
        let spin = RigidMotion::rotation_about([1.0, 0.0, 0.0], 90.0).unwrap();
        let t = ldos_geometry::GeometryTransform::new("spin")
            .with_motion("a", spin.clone())
            .with_motion("b", spin);
        let moved = g.apply_transform(&t).unwrap();
        let reused = m.assemble_block(&moved, 0, 1, omega, &[0.5], &mut cache).unwrap();
        let fresh = m
            .assemble_block(&moved, 0, 1, omega, &[0.5], &mut PairCache::default())
            .unwrap();
        assert_eq!(reused, fresh);
        assert_ne!(reused, before);
    }

    #[test]
    fn test_single_dipole_ldos_matches_closed_form() {
        // One node at the origin, observed at x on the z-axis: the scattered
        // electric Green's function is G(x,0) alpha G(0,x).
        let g = Geometry::new(vec![Surface::new("p", "m", vec![[0.0; 3]])], None).unwrap();
        let m = model(1, Complex64::new(-3.0, 0.5));
        let omega = Complex64::new(5.0, 0.0);
        let mut matrix = SystemMatrix::new(&g);
        let mut caches = BlockCaches::new(&g);
        assemble_pairwise(&m, &g, None, omega, &[], &mut matrix, &mut caches).unwrap();
        let factored = matrix.factorize().unwrap();

        let points = EvaluationPoints::new("z", array![[0.0, 0.0, 0.2]]).unwrap();
        let gfs = m.dyadic_gfs(&g, omega, &[], &points, &factored, true).unwrap();

        let alpha = 1.0 / m.inverse_polarisability(0, omega).unwrap();
        let x = [0.0, 0.0, 0.2];
        let g0 = dyadic_greens_tensor(&x, &[0.0; 3], omega).unwrap();
        for mu in 0..3 {
            for nu in 0..3 {
                let mut expected = Complex64::new(0.0, 0.0);
                for l in 0..3 {
                    expected += g0[mu][l] * alpha * g0[l][nu];
                }
                let got = gfs[[0, 3 * mu + nu]];
                assert!((got - expected).norm() <= 1e-9 * expected.norm().max(1e-12));
            }
        }
    }

    #[test]
    fn test_free_space_term_at_coincident_points() {
        let g = Geometry::new(vec![Surface::new("p", "m", vec![[5.0, 0.0, 0.0]])], None).unwrap();
        let m = model(1, Complex64::new(1.0 + 1e-9, 0.0));
        let omega = Complex64::new(2.0, 0.0);
        let mut matrix = SystemMatrix::new(&g);
        m.assemble_whole_matrix(&g, omega, &mut matrix, &mut BlockCaches::new(&g)).unwrap();
        let factored = matrix.factorize().unwrap();

        let points = EvaluationPoints::new("o", array![[0.0, 0.0, 0.0]]).unwrap();
        let gfs = m.dyadic_gfs(&g, omega, &[], &points, &factored, false).unwrap();
        let expected = self_term(omega);
        for d in 0..3 {
            assert!((gfs[[0, 4 * d]] - expected).norm() < 1e-6);
            assert!((gfs[[0, 9 + 4 * d]] - expected).norm() < 1e-6);
        }
    }

    #[test]
    fn test_only_translations_keep_self_blocks() {
        let m = model(1, Complex64::new(2.0, 0.0));
        assert!(m.diagonal_block_invariant(&RigidMotion::translation(1.0, 2.0, 3.0)));
        let turn = RigidMotion::rotation_about([0.0, 0.0, 1.0], 30.0).unwrap();
        assert!(!m.diagonal_block_invariant(&turn));
    }
}
