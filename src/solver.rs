use crate::{
    datatypes::{GlobalSystem, Mesh, Vertex},
    error::HematiteError,
    mesher::{edge_length, triangle_area, triangle_diameter},
    problems::{Coefficient, Problem},
};
use indicatif::ProgressBar;
use nalgebra::{matrix, DVector, SMatrix, SVector};
use nalgebra_sparse::{factorization::CscCholesky, CooMatrix, CscMatrix};

/// Relative tolerance for the assembled-matrix symmetry self-check
pub const SYMMETRY_TOL: f64 = 1e-12;

/// A triangle whose area falls below this fraction of its squared diameter
/// is treated as degenerate (collinear vertices)
const DEGENERATE_AREA_RATIO: f64 = 1e-12;

/// Computes the elementary stiffness matrix of one P1 triangle
///
/// Entry (i, j) is κ/(4*area) times the dot product of the edge vectors
/// opposite local vertices i and j. Only the upper triangle is computed; the
/// lower one is mirrored, so symmetry holds by construction.
///
/// # Arguments
/// * `p1`, `p2`, `p3` - The triangle vertices, in local order
/// * `kappa` - The conductivity evaluated at the triangle centroid
///
/// # Returns
/// A symmetric 3x3 stiffness matrix, or a DegenerateElement error if the
/// vertices are (near-)collinear
pub fn element_stiffness(
    p1: &Vertex,
    p2: &Vertex,
    p3: &Vertex,
    kappa: f64,
) -> Result<SMatrix<f64, 3, 3>, HematiteError> {
    let area = triangle_area(p1, p2, p3);
    let diameter = triangle_diameter(p1, p2, p3);

    if area <= DEGENERATE_AREA_RATIO * diameter * diameter {
        return Err(HematiteError::DegenerateElement(format!(
            "triangle ({}, {}), ({}, {}), ({}, {}) has near-zero area {:e}",
            p1.x, p1.y, p2.x, p2.y, p3.x, p3.y, area
        )));
    }

    // Edge vector opposite local vertex i
    let edges = [
        (p2.x - p3.x, p2.y - p3.y),
        (p3.x - p1.x, p3.y - p1.y),
        (p1.x - p2.x, p1.y - p2.y),
    ];

    let coef = kappa / (4.0 * area);
    let mut stiffness = SMatrix::<f64, 3, 3>::zeros();

    for i in 0..3 {
        for j in i..3 {
            let value = coef * (edges[i].0 * edges[j].0 + edges[i].1 * edges[j].1);
            stiffness[(i, j)] = value;
            stiffness[(j, i)] = value;
        }
    }

    Ok(stiffness)
}

/// Computes the elementary load vector of one P1 triangle
///
/// Single-point centroid quadrature: the source contribution area/3 * f(G)
/// is split equally across the three vertices. Exact for constant f.
pub fn element_load(p1: &Vertex, p2: &Vertex, p3: &Vertex, source: Coefficient) -> SVector<f64, 3> {
    let area = triangle_area(p1, p2, p3);
    let xg = (p1.x + p2.x + p3.x) / 3.0;
    let yg = (p1.y + p2.y + p3.y) / 3.0;

    let value = (area / 3.0) * source(xg, yg);
    SVector::<f64, 3>::from([value, value, value])
}

/// Computes the penalization weight matrix of one boundary edge
///
/// This is the P1 edge mass matrix scaled by the penalization coefficient:
/// length*α/6 * [[2, 1], [1, 2]]. As α grows it turns the natural boundary
/// condition into an approximate Dirichlet one.
pub fn edge_weight(a: &Vertex, b: &Vertex, alpha: f64) -> SMatrix<f64, 2, 2> {
    let coef = edge_length(a, b) * alpha / 6.0;
    coef * matrix![2.0, 1.0; 1.0, 2.0]
}

/// Computes the exterior flux vector of one boundary edge
///
/// Midpoint quadrature: both endpoints receive length/2 * α * uE(midpoint).
pub fn edge_flux(a: &Vertex, b: &Vertex, alpha: f64, exterior: Coefficient) -> SVector<f64, 2> {
    let length = edge_length(a, b);
    let xm = (a.x + b.x) / 2.0;
    let ym = (a.y + b.y) / 2.0;

    let value = (length / 2.0) * alpha * exterior(xm, ym);
    SVector::<f64, 2>::from([value, value])
}

/// Assembles the global linear system for a mesh and problem instance
///
/// Runs the volumetric pass over all triangles, snapshots the pure stiffness
/// matrix K, then adds the boundary penalization terms for every edge whose
/// label is in `dirichlet_labels`. Edges with other labels are natural
/// (Neumann) boundaries and contribute nothing.
///
/// # Arguments
/// * `mesh` - The mesh to assemble over
/// * `problem` - The PDE instance supplying κ, f, α and uE
/// * `dirichlet_labels` - Boundary labels subject to penalization
///
/// # Returns
/// The assembled GlobalSystem (A, F, K)
pub fn assemble(
    mesh: &Mesh,
    problem: &Problem,
    dirichlet_labels: &[i32],
) -> Result<GlobalSystem, HematiteError> {
    let nv = mesh.vertices.len();
    let mut triplets: CooMatrix<f64> = CooMatrix::new(nv, nv);
    let mut f: DVector<f64> = DVector::zeros(nv);

    println!("info: assembling volumetric terms...");
    let bar = ProgressBar::new(mesh.triangles.len() as u64);
    for triangle in &mesh.triangles {
        bar.inc(1);

        let global = triangle.vertices;
        let p1 = &mesh.vertices[global[0]];
        let p2 = &mesh.vertices[global[1]];
        let p3 = &mesh.vertices[global[2]];

        let xg = (p1.x + p2.x + p3.x) / 3.0;
        let yg = (p1.y + p2.y + p3.y) / 3.0;
        let kappa = (problem.conductivity)(xg, yg);

        let k_l = element_stiffness(p1, p2, p3, kappa)?;
        let f_l = element_load(p1, p2, p3, problem.source);

        for i in 0..3 {
            for j in 0..3 {
                triplets.push(global[i], global[j], k_l[(i, j)]);
            }
            f[global[i]] += f_l[i];
        }
    }
    bar.finish_with_message(format!(
        "info: assembled {} volumetric contributions\n",
        mesh.triangles.len()
    ));

    // Snapshot the volumetric-only stiffness matrix before any boundary term
    // lands in the triplet list. The energy-norm error is measured against
    // this matrix, not against the penalized system matrix.
    let k = CscMatrix::from(&triplets);

    let dirichlet_edges = mesh
        .boundary_edges
        .iter()
        .filter(|e| dirichlet_labels.contains(&e.label));

    let mut penalized = 0usize;
    for edge in dirichlet_edges {
        let global = edge.vertices;
        let a_vertex = &mesh.vertices[global[0]];
        let b_vertex = &mesh.vertices[global[1]];

        let xm = (a_vertex.x + b_vertex.x) / 2.0;
        let ym = (a_vertex.y + b_vertex.y) / 2.0;
        let alpha = (problem.transfer)(xm, ym);

        let p_a = edge_weight(a_vertex, b_vertex, alpha);
        let e_a = edge_flux(a_vertex, b_vertex, alpha, problem.exterior);

        for i in 0..2 {
            for j in 0..2 {
                triplets.push(global[i], global[j], p_a[(i, j)]);
            }
            f[global[i]] += e_a[i];
        }
        penalized += 1;
    }
    println!("info: penalized {} Dirichlet boundary edges", penalized);

    let a = CscMatrix::from(&triplets);

    for (label, matrix) in [("A", &a), ("K", &k)] {
        let asymmetry = relative_asymmetry(matrix);
        if asymmetry > SYMMETRY_TOL {
            println!(
                "warning: matrix {} deviates from symmetry by {:e} (relative); \
                 this indicates an assembly defect",
                label, asymmetry
            );
        }
    }

    Ok(GlobalSystem { a, f, k })
}

/// Measures ||M - M^T||_F relative to ||M||_F
pub fn relative_asymmetry(matrix: &CscMatrix<f64>) -> f64 {
    let norm = f64::sqrt(matrix.values().iter().map(|v| v * v).sum());
    if norm == 0.0 {
        return 0.0;
    }

    let difference = matrix - &matrix.transpose();
    let difference_norm = f64::sqrt(difference.values().iter().map(|v| v * v).sum());

    difference_norm / norm
}

/// Solves the assembled system A*Uh = F with a direct sparse Cholesky
///
/// # Arguments
/// * `system` - The assembled global system
///
/// # Returns
/// The nodal solution vector, or a SingularSystem error when the matrix has
/// an empty row (isolated vertex) or is not positive definite
pub fn solve_system(system: &GlobalSystem) -> Result<DVector<f64>, HematiteError> {
    let n = system.a.nrows();

    // A structurally empty diagonal means a vertex with no incident triangle;
    // fail with a dedicated error instead of surfacing a factorization panic.
    let mut diagonal = vec![0.0f64; n];
    for (i, j, value) in system.a.triplet_iter() {
        if i == j {
            diagonal[i] += value;
        }
    }
    if let Some(row) = diagonal.iter().position(|d| *d == 0.0) {
        return Err(HematiteError::SingularSystem(format!(
            "matrix diagonal is zero at row {}; the mesh has an isolated vertex",
            row
        )));
    }

    println!("info: solving {} x {} sparse system...", n, n);
    let start = std::time::Instant::now();

    let factorization = match CscCholesky::factor(&system.a) {
        Ok(chol) => chol,
        Err(err) => {
            return Err(HematiteError::SingularSystem(format!(
                "sparse Cholesky factorization failed: {:?}",
                err
            )))
        }
    };
    let solution: DVector<f64> = factorization.solve(&system.f).column(0).into();

    let elapsed = (std::time::Instant::now() - start).as_secs_f32();
    println!("info: solved system in {:.3} seconds", elapsed);

    Ok(solution)
}

/// Computes the discrete energy-norm error sqrt(|diff^T K diff|)
///
/// `diff` is the nodal interpolant of the exact solution minus the computed
/// solution, and K is the volumetric-only stiffness matrix. The absolute
/// value guards against a tiny negative from floating-point cancellation; a
/// genuinely negative quadratic form means K is broken and gets reported.
pub fn energy_norm_error(uh: &DVector<f64>, system: &GlobalSystem, mesh: &Mesh, exact: Coefficient) -> f64 {
    let interpolant = DVector::from_iterator(
        mesh.vertices.len(),
        mesh.vertices.iter().map(|v| exact(v.x, v.y)),
    );
    let diff = interpolant - uh;

    let quadratic = diff.dot(&(&system.k * &diff));
    if quadratic < -1e-10 {
        println!(
            "warning: energy quadratic form is {:e}; the stiffness matrix is \
             not positive semi-definite",
            quadratic
        );
    }

    f64::sqrt(f64::abs(quadratic))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datatypes::{BoundaryEdge, Triangle};
    use crate::problems;

    fn vertex(x: f64, y: f64) -> Vertex {
        Vertex { x, y }
    }

    /// Unit square split along the main diagonal, boundary labeled
    /// bottom=1, right=2, top=3, left=4
    fn unit_square_mesh() -> Mesh {
        Mesh {
            vertices: vec![
                vertex(0.0, 0.0),
                vertex(1.0, 0.0),
                vertex(1.0, 1.0),
                vertex(0.0, 1.0),
            ],
            triangles: vec![
                Triangle {
                    vertices: [0, 1, 2],
                },
                Triangle {
                    vertices: [0, 2, 3],
                },
            ],
            boundary_edges: vec![
                BoundaryEdge {
                    vertices: [0, 1],
                    label: 1,
                },
                BoundaryEdge {
                    vertices: [1, 2],
                    label: 2,
                },
                BoundaryEdge {
                    vertices: [2, 3],
                    label: 3,
                },
                BoundaryEdge {
                    vertices: [3, 0],
                    label: 4,
                },
            ],
        }
    }

    #[test]
    fn reference_triangle_stiffness() {
        let k = element_stiffness(
            &vertex(0.0, 0.0),
            &vertex(1.0, 0.0),
            &vertex(0.0, 1.0),
            1.0,
        )
        .unwrap();

        let expected = matrix![
            1.0, -0.5, -0.5;
            -0.5, 0.5, 0.0;
            -0.5, 0.0, 0.5;
        ];

        assert!((k - expected).abs().max() < 1e-14);
    }

    #[test]
    fn stiffness_is_exactly_symmetric() {
        let k = element_stiffness(
            &vertex(0.13, -0.42),
            &vertex(2.71, 0.06),
            &vertex(1.11, 1.93),
            3.7,
        )
        .unwrap();

        for i in 0..3 {
            for j in 0..3 {
                assert_eq!(k[(i, j)].to_bits(), k[(j, i)].to_bits());
            }
        }
    }

    #[test]
    fn degenerate_triangle_is_rejected() {
        // Three collinear points must error out, never produce Inf/NaN
        let result = element_stiffness(
            &vertex(0.0, 0.0),
            &vertex(1.0, 0.0),
            &vertex(2.0, 0.0),
            1.0,
        );

        assert!(matches!(
            result,
            Err(HematiteError::DegenerateElement(_))
        ));
    }

    #[test]
    fn load_kernel_uses_centroid_quadrature() {
        let f_l = element_load(
            &vertex(0.0, 0.0),
            &vertex(1.0, 0.0),
            &vertex(0.0, 1.0),
            |x, y| x + y,
        );

        // area = 1/2, centroid value = 2/3, each entry = (1/6) * (2/3)
        for i in 0..3 {
            assert!((f_l[i] - 1.0 / 9.0).abs() < 1e-15);
        }
    }

    #[test]
    fn load_kernel_is_idempotent() {
        let p1 = vertex(0.37, 1.22);
        let p2 = vertex(4.01, 0.58);
        let p3 = vertex(2.66, 3.09);
        let source: Coefficient = |x, y| f64::sin(x) * f64::exp(y);

        let first = element_load(&p1, &p2, &p3, source);
        let second = element_load(&p1, &p2, &p3, source);

        for i in 0..3 {
            assert_eq!(first[i].to_bits(), second[i].to_bits());
        }
    }

    #[test]
    fn edge_weight_matches_reference() {
        let p = edge_weight(&vertex(0.0, 0.0), &vertex(0.0, 1.0), 1.0e8);
        let expected: SMatrix<f64, 2, 2> = (1.0e8 / 6.0) * matrix![2.0, 1.0; 1.0, 2.0];

        assert!((p - expected).abs().max() < 1e-6);
        assert_eq!(p[(0, 1)].to_bits(), p[(1, 0)].to_bits());
    }

    #[test]
    fn edge_flux_uses_midpoint_quadrature() {
        let e = edge_flux(&vertex(0.0, 0.0), &vertex(0.0, 1.0), 2.0, |_x, y| y);

        // length = 1, midpoint value = 1/2, each entry = (1/2) * 2 * (1/2)
        assert!((e[0] - 0.5).abs() < 1e-15);
        assert!((e[1] - 0.5).abs() < 1e-15);
    }

    #[test]
    fn assembled_matrices_are_symmetric() {
        let mesh = unit_square_mesh();
        let problem = problems::manufactured();
        let system = assemble(&mesh, &problem, &[2, 4]).unwrap();

        assert!(relative_asymmetry(&system.a) < SYMMETRY_TOL);
        assert!(relative_asymmetry(&system.k) < SYMMETRY_TOL);
    }

    #[test]
    fn volumetric_stiffness_is_positive_semidefinite() {
        let mesh = unit_square_mesh();
        let problem = problems::manufactured();
        let system = assemble(&mesh, &problem, &[2, 4]).unwrap();

        // Deterministic pseudo-random probe vectors
        let mut state: u64 = 0x9e3779b97f4a7c15;
        let mut next = || -> f64 {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
            ((state >> 33) as f64) / (u32::MAX as f64) - 0.5
        };

        for _ in 0..32 {
            let z = DVector::from_iterator(mesh.vertices.len(), (0..mesh.vertices.len()).map(|_| next()));
            let quadratic = z.dot(&(&system.k * &z));
            assert!(quadratic >= -1e-10, "z^T K z = {}", quadratic);
        }
    }

    #[test]
    fn snapshot_excludes_boundary_terms() {
        let mesh = unit_square_mesh();
        let problem = problems::manufactured();
        let system = assemble(&mesh, &problem, &[2, 4]).unwrap();

        // Every vertex touches a penalized edge, so the penalized diagonal
        // must strictly dominate the volumetric one.
        let mut a_diag = vec![0.0; 4];
        let mut k_diag = vec![0.0; 4];
        for (i, j, v) in system.a.triplet_iter() {
            if i == j {
                a_diag[i] += v;
            }
        }
        for (i, j, v) in system.k.triplet_iter() {
            if i == j {
                k_diag[i] += v;
            }
        }
        for i in 0..4 {
            assert!(a_diag[i] > k_diag[i] + 1.0e6);
        }
    }

    #[test]
    fn affine_field_is_recovered() {
        // u = 1 + 2x with Dirichlet on the vertical edges and natural
        // (homogeneous Neumann) horizontal edges: P1 reproduces the field,
        // so the energy-norm error collapses to the penalization residual.
        let mesh = unit_square_mesh();
        let problem = problems::linear();
        let system = assemble(&mesh, &problem, &[2, 4]).unwrap();
        let uh = solve_system(&system).unwrap();

        let error = energy_norm_error(&uh, &system, &mesh, problem.exact);
        assert!(error < 1e-10, "energy error {} for an affine field", error);

        for (i, v) in mesh.vertices.iter().enumerate() {
            assert!((uh[i] - (1.0 + 2.0 * v.x)).abs() < 1e-9);
        }
    }

    #[test]
    fn isolated_vertex_is_a_singular_system() {
        let mut mesh = unit_square_mesh();
        mesh.vertices.push(vertex(5.0, 5.0));

        let problem = problems::manufactured();
        let system = assemble(&mesh, &problem, &[2, 4]).unwrap();
        let result = solve_system(&system);

        assert!(matches!(
            result,
            Err(HematiteError::SingularSystem(_))
        ));
    }
}
