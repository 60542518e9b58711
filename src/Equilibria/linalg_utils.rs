//! Small dense linear algebra helpers on top of nalgebra: reduced row echelon form,
//! rank, null space and greedy selection of independent rows.
use nalgebra::{DMatrix, RowDVector};

/// pivots smaller than this are treated as zero
pub const PIVOT_TOLERANCE: f64 = 1e-10;

fn snap(value: f64) -> f64 {
    let rounded = value.round();
    if (value - rounded).abs() < 1e-12 {
        rounded
    } else {
        value
    }
}

/// Reduced row echelon form of `m` together with the transformation matrix `t`
/// such that `t * m == reduced`, and the pivot columns.
pub fn rref_with_transform(m: &DMatrix<f64>) -> (DMatrix<f64>, DMatrix<f64>, Vec<usize>) {
    let (nrows, ncols) = m.shape();
    let mut a = m.clone();
    let mut t = DMatrix::<f64>::identity(nrows, nrows);
    let mut pivots = Vec::new();
    let mut row = 0;
    for col in 0..ncols {
        if row >= nrows {
            break;
        }
        // partial pivoting
        let (best, best_value) = (row..nrows)
            .map(|r| (r, a[(r, col)].abs()))
            .fold((row, 0.0), |acc, x| if x.1 > acc.1 { x } else { acc });
        if best_value < PIVOT_TOLERANCE {
            continue;
        }
        a.swap_rows(row, best);
        t.swap_rows(row, best);
        let pivot = a[(row, col)];
        for j in 0..ncols {
            a[(row, j)] /= pivot;
        }
        for j in 0..nrows {
            t[(row, j)] /= pivot;
        }
        for r in 0..nrows {
            let factor = a[(r, col)];
            if r == row || factor == 0.0 {
                continue;
            }
            for j in 0..ncols {
                let pivot_row_value = a[(row, j)];
                a[(r, j)] -= factor * pivot_row_value;
            }
            for j in 0..nrows {
                let pivot_row_value = t[(row, j)];
                t[(r, j)] -= factor * pivot_row_value;
            }
        }
        pivots.push(col);
        row += 1;
    }
    a.apply(|x| *x = snap(*x));
    t.apply(|x| *x = snap(*x));
    (a, t, pivots)
}

pub fn rref(m: &DMatrix<f64>) -> (DMatrix<f64>, Vec<usize>) {
    let (reduced, _, pivots) = rref_with_transform(m);
    (reduced, pivots)
}

pub fn rank(m: &DMatrix<f64>) -> usize {
    if m.nrows() == 0 || m.ncols() == 0 {
        return 0;
    }
    rref(m).1.len()
}

/// Basis of the null space {v : m v = 0}; every basis vector is a row of the result.
/// The basis is built from the free columns of the reduced row echelon form.
pub fn null_space(m: &DMatrix<f64>) -> DMatrix<f64> {
    let ncols = m.ncols();
    let (reduced, pivots) = if m.nrows() == 0 {
        (DMatrix::zeros(0, ncols), Vec::new())
    } else {
        rref(m)
    };
    let free: Vec<usize> = (0..ncols).filter(|c| !pivots.contains(c)).collect();
    let mut basis = DMatrix::zeros(free.len(), ncols);
    for (k, &f) in free.iter().enumerate() {
        basis[(k, f)] = 1.0;
        for (r, &p) in pivots.iter().enumerate() {
            basis[(k, p)] = -reduced[(r, f)];
        }
    }
    basis
}

/// Indices of rows that are linearly independent of the rows chosen before them.
pub fn independent_rows(m: &DMatrix<f64>) -> Vec<usize> {
    let mut chosen: Vec<RowDVector<f64>> = Vec::new();
    let mut indices = Vec::new();
    for (i, row) in m.row_iter().enumerate() {
        let mut candidate = chosen.clone();
        candidate.push(row.clone_owned());
        if rank(&DMatrix::from_rows(&candidate)) == candidate.len() {
            chosen = candidate;
            indices.push(i);
        }
    }
    indices
}

/// stacks row vectors into a matrix with `ncols` columns (also for an empty list)
pub fn stack_rows(rows: &[RowDVector<f64>], ncols: usize) -> DMatrix<f64> {
    if rows.is_empty() {
        DMatrix::zeros(0, ncols)
    } else {
        DMatrix::from_rows(rows)
    }
}
