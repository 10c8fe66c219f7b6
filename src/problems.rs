use std::f64::consts::PI;

use crate::error::HematiteError;

/// A scalar coefficient of the PDE, evaluated at a point of the domain
pub type Coefficient = fn(f64, f64) -> f64;

/// One configured PDE instance.
///
/// The assembler and solver are generic over the problem: they only ever see
/// these five callables. `exact` is used for the energy-norm error and for
/// the reference column of the solution output.
#[derive(Debug, Clone, Copy)]
pub struct Problem {
    pub name: &'static str,
    /// Conductivity κ(x, y), evaluated at triangle centroids
    pub conductivity: Coefficient,
    /// Source term f(x, y), evaluated at triangle centroids
    pub source: Coefficient,
    /// Penalization weight α(x, y), evaluated at Dirichlet edge midpoints
    pub transfer: Coefficient,
    /// Dirichlet target value uE(x, y), evaluated at Dirichlet edge midpoints
    pub exterior: Coefficient,
    /// Known exact solution u(x, y)
    pub exact: Coefficient,
}

/// Looks a built-in problem up by name
///
/// # Arguments
/// * `name` - The problem name from the job file
///
/// # Returns
/// The matching Problem, or an Input error listing the known names
pub fn by_name(name: &str) -> Result<Problem, HematiteError> {
    match name {
        "manufactured" => Ok(manufactured()),
        "linear" => Ok(linear()),
        other => Err(HematiteError::Input(format!(
            "unknown problem '{}'; available problems: manufactured, linear",
            other
        ))),
    }
}

/// The manufactured Poisson problem on (0,4) x (0,2)
///
/// -div(κ grad u) = f with u = 1 + sin(πx/2) + x(x-4)cos(πy/2), Dirichlet
/// data on x=0 and x=4 (labels 2 and 4 in the reference meshes) and
/// homogeneous Neumann on y=0 and y=2.
pub fn manufactured() -> Problem {
    Problem {
        name: "manufactured",
        conductivity: |_x, _y| 1.0,
        source: manufactured_source,
        transfer: |_x, _y| 1.0e8,
        exterior: manufactured_exact,
        exact: manufactured_exact,
    }
}

fn manufactured_exact(x: f64, y: f64) -> f64 {
    1.0 + f64::sin(PI * x / 2.0) + x * (x - 4.0) * f64::cos(PI * y / 2.0)
}

fn manufactured_source(x: f64, y: f64) -> f64 {
    // f = -Δu
    let pi2_4 = PI * PI / 4.0;
    pi2_4 * (f64::sin(PI * x / 2.0) + x * (x - 4.0) * f64::cos(PI * y / 2.0))
        - 2.0 * f64::cos(PI * y / 2.0)
}

/// An affine patch problem on the unit square
///
/// u = 1 + 2x, f = 0, Dirichlet on the vertical boundaries (labels 2 and 4)
/// where the trace is constant per edge, homogeneous Neumann on the
/// horizontal boundaries where du/dn vanishes. P1 elements reproduce this
/// field up to the penalization residual, so it doubles as an exactness
/// check for the whole pipeline.
pub fn linear() -> Problem {
    Problem {
        name: "linear",
        conductivity: |_x, _y| 1.0,
        source: |_x, _y| 0.0,
        transfer: |_x, _y| 1.0e13,
        exterior: linear_exact,
        exact: linear_exact,
    }
}

fn linear_exact(x: f64, _y: f64) -> f64 {
    1.0 + 2.0 * x
}
