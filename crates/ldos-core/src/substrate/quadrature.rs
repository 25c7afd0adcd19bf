//! Adaptive Gauss–Kronrod quadrature for complex vector integrands.
//!
//! Globally adaptive 7/15-point Gauss–Kronrod: the interval with the largest
//! error estimate is bisected until every component satisfies
//! `err <= max(abs_tol, rel_tol * |I|)` or the evaluation budget runs out.

use num_complex::Complex64;

use crate::solver::SolverError;
use crate::types::Tolerances;

/// Kronrod abscissae on [-1, 1], positive half, centre last.
const XGK: [f64; 8] = [
    0.991_455_371_120_812_6,
    0.949_107_912_342_758_5,
    0.864_864_423_359_769_1,
    0.741_531_185_599_394_4,
    0.586_087_235_467_691_1,
    0.405_845_151_377_397_2,
    0.207_784_955_007_898_5,
    0.0,
];

/// Kronrod weights matching [`XGK`].
const WGK: [f64; 8] = [
    0.022_935_322_010_529_22,
    0.063_092_092_629_978_55,
    0.104_790_010_322_250_18,
    0.140_653_259_715_525_92,
    0.169_004_726_639_267_9,
    0.190_350_578_064_785_4,
    0.204_432_940_075_298_9,
    0.209_482_141_084_727_83,
];

/// Gauss weights for the odd-indexed Kronrod abscissae (1, 3, 5, 7).
const WG: [f64; 4] = [
    0.129_484_966_168_869_7,
    0.279_705_391_489_276_7,
    0.381_830_050_505_118_9,
    0.417_959_183_673_469_4,
];

const EVALS_PER_RULE: usize = 15;

/// Integral estimate with per-component absolute error estimates.
#[derive(Debug, Clone, Copy)]
pub struct Estimate<const N: usize> {
    pub value: [Complex64; N],
    pub error: [f64; N],
    pub evaluations: usize,
}

struct Segment<const N: usize> {
    a: f64,
    b: f64,
    value: [Complex64; N],
    error: [f64; N],
}

impl<const N: usize> Segment<N> {
    fn worst(&self) -> f64 {
        self.error.iter().copied().fold(0.0, f64::max)
    }
}

fn kronrod<const N: usize>(f: &impl Fn(f64) -> [Complex64; N], a: f64, b: f64) -> Segment<N> {
    let centre = 0.5 * (a + b);
    let half = 0.5 * (b - a);
    let zero = Complex64::new(0.0, 0.0);
    let mut k = [zero; N];
    let mut g = [zero; N];

    let fc = f(centre);
    for c in 0..N {
        k[c] = fc[c] * WGK[7];
        g[c] = fc[c] * WG[3];
    }
    for j in 0..7 {
        let dx = half * XGK[j];
        let (f1, f2) = (f(centre - dx), f(centre + dx));
        for c in 0..N {
            let pair = f1[c] + f2[c];
            k[c] += pair * WGK[j];
            if j % 2 == 1 {
                g[c] += pair * WG[j / 2];
            }
        }
    }

    let mut value = [zero; N];
    let mut error = [0.0; N];
    for c in 0..N {
        value[c] = k[c] * half;
        error[c] = ((k[c] - g[c]) * half).norm();
    }
    Segment { a, b, value, error }
}

/// Integrate `f` over `[a, b]`.
pub fn integrate<const N: usize>(
    f: impl Fn(f64) -> [Complex64; N],
    a: f64,
    b: f64,
    tolerances: &Tolerances,
) -> Result<Estimate<N>, SolverError> {
    let mut segments = vec![kronrod(&f, a, b)];
    let mut evaluations = EVALS_PER_RULE;

    loop {
        let mut value = [Complex64::new(0.0, 0.0); N];
        let mut error = [0.0; N];
        for s in &segments {
            for c in 0..N {
                value[c] += s.value[c];
                error[c] += s.error[c];
            }
        }
        if value.iter().any(|v| !v.re.is_finite() || !v.im.is_finite()) {
            return Err(SolverError::Quadrature {
                max_evals: tolerances.max_evals,
                error: f64::INFINITY,
                tolerance: tolerances.abs_tol,
            });
        }

        let mut worst_excess = None;
        for c in 0..N {
            let tolerance = tolerances.abs_tol.max(tolerances.rel_tol * value[c].norm());
            if error[c] > tolerance {
                worst_excess = Some((error[c], tolerance));
                break;
            }
        }
        let Some((err, tolerance)) = worst_excess else {
            return Ok(Estimate {
                value,
                error,
                evaluations,
            });
        };
        if evaluations + 2 * EVALS_PER_RULE > tolerances.max_evals {
            return Err(SolverError::Quadrature {
                max_evals: tolerances.max_evals,
                error: err,
                tolerance,
            });
        }

        let (idx, _) = segments
            .iter()
            .enumerate()
            .fold((0, f64::NEG_INFINITY), |best, (i, s)| {
                if s.worst() > best.1 {
                    (i, s.worst())
                } else {
                    best
                }
            });
        let s = segments.swap_remove(idx);
        let mid = 0.5 * (s.a + s.b);
        segments.push(kronrod(&f, s.a, mid));
        segments.push(kronrod(&f, mid, s.b));
        evaluations += 2 * EVALS_PER_RULE;
    }
}
