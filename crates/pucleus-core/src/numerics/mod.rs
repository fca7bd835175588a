//! Least-squares kernels shared by smoothing, calibration, and spectrum
//! comparison: a pivoted LU solve for small dense systems, ordinary linear
//! regression, and the coefficient of determination.

const SINGULAR_PIVOT_EPSILON: f64 = 1.0e-15;
const ILL_CONDITIONED_RELATIVE_PIVOT_EPSILON: f64 = 1.0e-12;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LsqError {
    #[error("least-squares solve requires a square matrix, got {rows}x{cols}")]
    NonSquareMatrix { rows: usize, cols: usize },
    #[error("least-squares solve requires a non-empty matrix")]
    EmptyMatrix,
    #[error("normal-equation matrix is singular at pivot index {pivot_index}")]
    SingularMatrix { pivot_index: usize },
    #[error("normal-equation matrix is ill-conditioned at pivot index {pivot_index}")]
    IllConditionedMatrix { pivot_index: usize },
    #[error("right-hand side length mismatch: expected {expected}, got {actual}")]
    RhsLengthMismatch { expected: usize, actual: usize },
    #[error("regression requires at least 2 samples, got {actual}")]
    InsufficientSamples { actual: usize },
    #[error("regression sample lengths differ: x={x}, y={y}")]
    SampleLengthMismatch { x: usize, y: usize },
    #[error("regression abscissa is degenerate (all samples share one value)")]
    DegenerateAbscissa,
}

/// Row-major dense square matrix, sized for normal equations (order <= 5 in
/// practice; nothing here assumes a bound).
#[derive(Debug, Clone, PartialEq)]
pub struct DenseMatrix {
    rows: usize,
    cols: usize,
    values: Vec<f64>,
}

impl DenseMatrix {
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            values: vec![0.0; rows * cols],
        }
    }

    pub fn nrows(&self) -> usize {
        self.rows
    }

    pub fn ncols(&self) -> usize {
        self.cols
    }
}

impl std::ops::Index<(usize, usize)> for DenseMatrix {
    type Output = f64;

    fn index(&self, (row, col): (usize, usize)) -> &f64 {
        &self.values[row * self.cols + col]
    }
}

impl std::ops::IndexMut<(usize, usize)> for DenseMatrix {
    fn index_mut(&mut self, (row, col): (usize, usize)) -> &mut f64 {
        &mut self.values[row * self.cols + col]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LuDecomposition {
    lu: DenseMatrix,
    pivots: Vec<usize>,
    input_norm_infty: f64,
}

impl LuDecomposition {
    pub fn dimension(&self) -> usize {
        self.lu.nrows()
    }

    pub fn solve(&self, rhs: &[f64]) -> Result<Vec<f64>, LsqError> {
        let dimension = self.dimension();
        if rhs.len() != dimension {
            return Err(LsqError::RhsLengthMismatch {
                expected: dimension,
                actual: rhs.len(),
            });
        }

        let mut forward = vec![0.0; dimension];
        for row in 0..dimension {
            let mut value = rhs[self.pivots[row]];
            for col in 0..row {
                value -= self.lu[(row, col)] * forward[col];
            }
            forward[row] = value;
        }

        let mut solution = vec![0.0; dimension];
        for row in (0..dimension).rev() {
            let mut value = forward[row];
            for col in (row + 1)..dimension {
                value -= self.lu[(row, col)] * solution[col];
            }

            let diagonal = self.lu[(row, row)];
            if diagonal.abs() <= SINGULAR_PIVOT_EPSILON {
                return Err(LsqError::SingularMatrix { pivot_index: row });
            }
            if is_ill_conditioned_pivot(diagonal, self.input_norm_infty) {
                return Err(LsqError::IllConditionedMatrix { pivot_index: row });
            }

            solution[row] = value / diagonal;
        }

        Ok(solution)
    }
}

pub fn lu_factorize(matrix: &DenseMatrix) -> Result<LuDecomposition, LsqError> {
    let dimension = validate_square_shape(matrix)?;
    let input_norm_infty = matrix_infinity_norm(matrix);
    let mut lu = matrix.clone();
    let mut pivots: Vec<usize> = (0..dimension).collect();

    for pivot_col in 0..dimension {
        let (pivot_row, pivot_magnitude) = select_pivot_row(&lu, pivot_col);
        if pivot_magnitude <= SINGULAR_PIVOT_EPSILON {
            return Err(LsqError::SingularMatrix {
                pivot_index: pivot_col,
            });
        }

        if pivot_row != pivot_col {
            swap_rows(&mut lu, pivot_row, pivot_col);
            pivots.swap(pivot_row, pivot_col);
        }

        let pivot_value = lu[(pivot_col, pivot_col)];
        for row in (pivot_col + 1)..dimension {
            let factor = lu[(row, pivot_col)] / pivot_value;
            lu[(row, pivot_col)] = factor;
            for col in (pivot_col + 1)..dimension {
                let update = factor * lu[(pivot_col, col)];
                lu[(row, col)] -= update;
            }
        }
    }

    Ok(LuDecomposition {
        lu,
        pivots,
        input_norm_infty,
    })
}

/// Solve `matrix * x = rhs` via a fresh factorization.
pub fn solve_dense(matrix: &DenseMatrix, rhs: &[f64]) -> Result<Vec<f64>, LsqError> {
    lu_factorize(matrix)?.solve(rhs)
}

fn validate_square_shape(matrix: &DenseMatrix) -> Result<usize, LsqError> {
    if matrix.nrows() == 0 || matrix.ncols() == 0 {
        return Err(LsqError::EmptyMatrix);
    }
    if matrix.nrows() != matrix.ncols() {
        return Err(LsqError::NonSquareMatrix {
            rows: matrix.nrows(),
            cols: matrix.ncols(),
        });
    }
    Ok(matrix.nrows())
}

fn matrix_infinity_norm(matrix: &DenseMatrix) -> f64 {
    let mut norm: f64 = 0.0;
    for row in 0..matrix.nrows() {
        let mut row_sum = 0.0;
        for col in 0..matrix.ncols() {
            row_sum += matrix[(row, col)].abs();
        }
        norm = norm.max(row_sum);
    }
    norm
}

fn select_pivot_row(matrix: &DenseMatrix, pivot_col: usize) -> (usize, f64) {
    let mut best_row = pivot_col;
    let mut best_magnitude = matrix[(pivot_col, pivot_col)].abs();
    for row in (pivot_col + 1)..matrix.nrows() {
        let magnitude = matrix[(row, pivot_col)].abs();
        if magnitude > best_magnitude {
            best_row = row;
            best_magnitude = magnitude;
        }
    }
    (best_row, best_magnitude)
}

fn swap_rows(matrix: &mut DenseMatrix, first: usize, second: usize) {
    for col in 0..matrix.ncols() {
        let held = matrix[(first, col)];
        matrix[(first, col)] = matrix[(second, col)];
        matrix[(second, col)] = held;
    }
}

fn is_ill_conditioned_pivot(diagonal: f64, input_norm_infty: f64) -> bool {
    if input_norm_infty <= 0.0 {
        return false;
    }
    diagonal.abs() < ILL_CONDITIONED_RELATIVE_PIVOT_EPSILON * input_norm_infty
}

/// Ordinary least-squares line fit of `y` on `x`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
}

impl LinearFit {
    pub fn evaluate(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }
}

pub fn linear_regression(x: &[f64], y: &[f64]) -> Result<LinearFit, LsqError> {
    if x.len() != y.len() {
        return Err(LsqError::SampleLengthMismatch {
            x: x.len(),
            y: y.len(),
        });
    }
    if x.len() < 2 {
        return Err(LsqError::InsufficientSamples { actual: x.len() });
    }

    let n = x.len() as f64;
    let sum_x: f64 = x.iter().sum();
    let sum_y: f64 = y.iter().sum();
    let sum_xx: f64 = x.iter().map(|value| value * value).sum();
    let sum_xy: f64 = x.iter().zip(y).map(|(a, b)| a * b).sum();

    let denominator = n * sum_xx - sum_x * sum_x;
    if denominator.abs() <= f64::EPSILON * n * sum_xx.abs().max(1.0) {
        return Err(LsqError::DegenerateAbscissa);
    }

    let slope = (n * sum_xy - sum_x * sum_y) / denominator;
    let intercept = (sum_y - slope * sum_x) / n;
    Ok(LinearFit { slope, intercept })
}

/// Coefficient of determination of a fit against observed samples.
///
/// Returns 1.0 when the observations carry no variance at all, because the
/// fit then reproduces them exactly or not at all and the ratio is
/// undefined.
pub fn r_squared(fit: &LinearFit, x: &[f64], y: &[f64]) -> f64 {
    debug_assert_eq!(x.len(), y.len());
    if y.is_empty() {
        return 1.0;
    }

    let mean_y: f64 = y.iter().sum::<f64>() / y.len() as f64;
    let total: f64 = y.iter().map(|value| (value - mean_y).powi(2)).sum();
    if total <= 0.0 {
        return 1.0;
    }

    let residual: f64 = x
        .iter()
        .zip(y)
        .map(|(a, b)| (b - fit.evaluate(*a)).powi(2))
        .sum();
    1.0 - residual / total
}

/// Fit `y = c0 + c1*t + ... + c_degree*t^degree` over sample abscissas `t`
/// by solving the normal equations. Used by the polynomial smoother with a
/// symmetric stencil, where `t` is the signed channel offset.
pub fn polynomial_fit(t: &[f64], y: &[f64], degree: usize) -> Result<Vec<f64>, LsqError> {
    if t.len() != y.len() {
        return Err(LsqError::SampleLengthMismatch {
            x: t.len(),
            y: y.len(),
        });
    }
    if t.len() < degree + 1 {
        return Err(LsqError::InsufficientSamples { actual: t.len() });
    }

    let order = degree + 1;
    let mut normal = DenseMatrix::zeros(order, order);
    let mut rhs = vec![0.0; order];

    for (&abscissa, &ordinate) in t.iter().zip(y) {
        let mut powers = vec![1.0; 2 * degree + 1];
        for exponent in 1..powers.len() {
            powers[exponent] = powers[exponent - 1] * abscissa;
        }
        for row in 0..order {
            for col in 0..order {
                normal[(row, col)] += powers[row + col];
            }
            rhs[row] += powers[row] * ordinate;
        }
    }

    solve_dense(&normal, &rhs)
}
