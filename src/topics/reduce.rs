// Dimensionality reduction — seeded PCA ahead of density clustering.
//
// Density estimates fall apart in a few hundred dimensions: every pairwise
// distance looks about the same and almost every point becomes noise. We
// project onto the top principal components first.
//
// Components come from randomized subspace iteration: a seeded random block
// is pushed through the matrix a fixed number of times, re-orthonormalized
// each pass, and the small projected matrix is diagonalized with Jacobi
// rotations. Each component's sign is fixed so its largest-magnitude entry is
// positive, so identical input gives identical output on every run. When
// there are fewer documents than embedding dimensions we decompose the
// (smaller) Gram matrix instead of the covariance matrix; both give the same
// projection.

use anyhow::Result;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

const SUBSPACE_ITERATIONS: usize = 30;
const OVERSAMPLE: usize = 5;
const JACOBI_SWEEPS: usize = 100;
const TOLERANCE: f64 = 1e-10;

/// Projects embeddings onto their top `n_components` principal axes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DimensionReducer {
    pub n_components: usize,
    pub seed: u64,
}

impl Default for DimensionReducer {
    fn default() -> Self {
        Self {
            n_components: 5,
            seed: 42,
        }
    }
}

impl DimensionReducer {
    pub fn new(n_components: usize, seed: u64) -> Self {
        Self {
            n_components: n_components.max(1),
            seed,
        }
    }

    /// Reduce every row of `data` to `min(n_components, dim)` coordinates.
    ///
    /// With `n_components >= rows - 1` the projection keeps all pairwise
    /// distances intact.
    pub fn fit_transform(&self, data: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
        let n = data.len();
        if n == 0 {
            return Ok(Vec::new());
        }

        let dim = data[0].len();
        if let Some(bad) = data.iter().position(|row| row.len() != dim) {
            anyhow::bail!(
                "Embedding {} has {} dimensions, expected {}",
                bad,
                data[bad].len(),
                dim
            );
        }

        let k = self.n_components.min(dim).max(1);
        if n < 2 {
            return Ok(vec![vec![0.0; k]; n]);
        }

        let centered = center(data);
        let use_gram = n < dim;
        let matrix = if use_gram {
            gram(&centered)
        } else {
            covariance(&centered)
        };

        let mut rng = StdRng::seed_from_u64(self.seed);
        let components = top_eigenpairs(&matrix, k, &mut rng);
        let mut projected = vec![vec![0.0; k]; n];

        // Components past the matrix rank carry no variance and stay at 0
        for (c, (eigenvalue, vector)) in components.iter().enumerate() {
            if use_gram {
                let scale = eigenvalue.sqrt();
                for (row, &u) in projected.iter_mut().zip(vector) {
                    row[c] = u * scale;
                }
            } else {
                for (row, x) in projected.iter_mut().zip(&centered) {
                    row[c] = dot(x, vector);
                }
            }
        }

        debug!(
            rows = n,
            from_dim = dim,
            to_dim = k,
            gram = use_gram,
            "Reduced embedding dimensionality"
        );

        Ok(projected)
    }
}

fn center(data: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let n = data.len() as f64;
    let dim = data[0].len();
    let mut mean = vec![0.0; dim];
    for row in data {
        for (m, x) in mean.iter_mut().zip(row) {
            *m += x;
        }
    }
    for m in &mut mean {
        *m /= n;
    }
    data.iter()
        .map(|row| row.iter().zip(&mean).map(|(x, m)| x - m).collect())
        .collect()
}

/// X Xᵀ: one entry per pair of rows.
fn gram(x: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let n = x.len();
    let mut g = vec![vec![0.0; n]; n];
    for i in 0..n {
        for j in i..n {
            let v = dot(&x[i], &x[j]);
            g[i][j] = v;
            g[j][i] = v;
        }
    }
    g
}

/// Xᵀ X: one entry per pair of columns.
fn covariance(x: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let dim = x[0].len();
    let mut c = vec![vec![0.0; dim]; dim];
    for row in x {
        for i in 0..dim {
            if row[i] == 0.0 {
                continue;
            }
            for j in i..dim {
                c[i][j] += row[i] * row[j];
            }
        }
    }
    for i in 0..dim {
        for j in 0..i {
            c[i][j] = c[j][i];
        }
    }
    c
}

/// Top `k` eigenpairs (largest first) of a symmetric positive
/// semi-definite matrix. Pairs with zero eigenvalue are omitted.
fn top_eigenpairs(matrix: &[Vec<f64>], k: usize, rng: &mut StdRng) -> Vec<(f64, Vec<f64>)> {
    let m = matrix.len();
    let width = (k + OVERSAMPLE).min(m);

    let mut basis: Vec<Vec<f64>> = (0..width)
        .map(|_| (0..m).map(|_| rng.random::<f64>() - 0.5).collect())
        .collect();
    orthonormalize(&mut basis);

    for _ in 0..SUBSPACE_ITERATIONS {
        let mut next: Vec<Vec<f64>> = basis.iter().map(|q| mat_vec(matrix, q)).collect();
        orthonormalize(&mut next);
        if next.is_empty() {
            return Vec::new();
        }
        basis = next;
    }

    // Rayleigh-Ritz: diagonalize Qᵀ M Q and rotate the basis
    let applied: Vec<Vec<f64>> = basis.iter().map(|q| mat_vec(matrix, q)).collect();
    let projected: Vec<Vec<f64>> = basis
        .iter()
        .map(|qi| applied.iter().map(|mq| dot(qi, mq)).collect())
        .collect();
    let (eigenvalues, rotation) = jacobi_eigen(projected);

    let mut pairs: Vec<(f64, Vec<f64>)> = eigenvalues
        .iter()
        .enumerate()
        .map(|(r, &lambda)| {
            let mut v = vec![0.0; m];
            for (i, q) in basis.iter().enumerate() {
                let w = rotation[i][r];
                for (acc, x) in v.iter_mut().zip(q) {
                    *acc += w * x;
                }
            }
            fix_sign(&mut v);
            (lambda, v)
        })
        .filter(|(lambda, _)| *lambda > TOLERANCE)
        .collect();

    pairs.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
    pairs.truncate(k);
    pairs
}

/// Modified Gram-Schmidt. Vectors whose residual is negligible next to the
/// largest input vector are dropped as numerically dependent.
fn orthonormalize(vectors: &mut Vec<Vec<f64>>) {
    let scale = vectors
        .iter()
        .map(|v| dot(v, v).sqrt())
        .fold(0.0_f64, f64::max);
    let mut kept: Vec<Vec<f64>> = Vec::with_capacity(vectors.len());
    if scale <= f64::EPSILON {
        vectors.clear();
        return;
    }
    for mut v in vectors.drain(..) {
        for q in &kept {
            let proj = dot(&v, q);
            for (x, y) in v.iter_mut().zip(q) {
                *x -= proj * y;
            }
        }
        if normalize(&mut v) > scale * 1e-9 {
            kept.push(v);
        }
    }
    *vectors = kept;
}

/// Cyclic Jacobi eigenvalue algorithm for a small symmetric matrix.
///
/// Returns the eigenvalues and a matrix whose column `r` is the eigenvector
/// for eigenvalue `r`.
fn jacobi_eigen(mut a: Vec<Vec<f64>>) -> (Vec<f64>, Vec<Vec<f64>>) {
    let n = a.len();
    let mut v: Vec<Vec<f64>> = (0..n)
        .map(|i| (0..n).map(|j| if i == j { 1.0 } else { 0.0 }).collect())
        .collect();

    for _ in 0..JACOBI_SWEEPS {
        let off: f64 = (0..n)
            .flat_map(|i| ((i + 1)..n).map(move |j| (i, j)))
            .map(|(i, j)| a[i][j] * a[i][j])
            .sum();
        if off < 1e-24 {
            break;
        }

        for p in 0..n {
            for q in (p + 1)..n {
                if a[p][q].abs() < f64::MIN_POSITIVE {
                    continue;
                }
                let theta = (a[q][q] - a[p][p]) / (2.0 * a[p][q]);
                let t = theta.signum() / (theta.abs() + (theta * theta + 1.0).sqrt());
                let c = 1.0 / (t * t + 1.0).sqrt();
                let s = t * c;

                for row in a.iter_mut() {
                    let (kp, kq) = (row[p], row[q]);
                    row[p] = c * kp - s * kq;
                    row[q] = s * kp + c * kq;
                }
                for k in 0..n {
                    let (pk, qk) = (a[p][k], a[q][k]);
                    a[p][k] = c * pk - s * qk;
                    a[q][k] = s * pk + c * qk;
                }
                for row in v.iter_mut() {
                    let (kp, kq) = (row[p], row[q]);
                    row[p] = c * kp - s * kq;
                    row[q] = s * kp + c * kq;
                }
            }
        }
    }

    let eigenvalues = (0..n).map(|i| a[i][i]).collect();
    (eigenvalues, v)
}

/// Flip `v` so its largest-magnitude entry is positive.
fn fix_sign(v: &mut [f64]) {
    let pivot = v
        .iter()
        .copied()
        .fold(0.0_f64, |best, x| if x.abs() > best.abs() { x } else { best });
    if pivot < 0.0 {
        for x in v.iter_mut() {
            *x = -*x;
        }
    }
}

fn mat_vec(matrix: &[Vec<f64>], v: &[f64]) -> Vec<f64> {
    matrix.iter().map(|row| dot(row, v)).collect()
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Normalize in place, returning the original length.
fn normalize(v: &mut [f64]) -> f64 {
    let norm = dot(v, v).sqrt();
    if norm > f64::EPSILON {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
    norm
}
