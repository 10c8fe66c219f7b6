use nalgebra::DVector;
use nalgebra_sparse::CscMatrix;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vertex {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct Triangle {
    pub vertices: [usize; 3],
}

#[derive(Debug, Clone, Copy)]
pub struct BoundaryEdge {
    pub vertices: [usize; 2],
    pub label: i32,
}

/// A loaded mesh. Immutable once built by the mesher; indices are 0-based.
#[derive(Debug)]
pub struct Mesh {
    pub vertices: Vec<Vertex>,
    pub triangles: Vec<Triangle>,
    pub boundary_edges: Vec<BoundaryEdge>,
}

/// The assembled linear system for one mesh.
///
/// `a` carries both the volumetric and the boundary penalization terms and is
/// what gets solved. `k` is the volumetric-only stiffness matrix, snapshotted
/// before any boundary term is added; the energy-norm error is measured
/// against `k`, never against `a`.
#[derive(Debug)]
pub struct GlobalSystem {
    pub a: CscMatrix<f64>,
    pub f: DVector<f64>,
    pub k: CscMatrix<f64>,
}

#[derive(Debug, Clone)]
pub struct ConvergenceRecord {
    pub mesh_id: String,
    pub vertex_count: usize,
    pub triangle_count: usize,
    pub quality: f64,
    pub diameter: f64,
    pub energy_error: f64,
}

/// One row of a convergence study. `record` is `None` when the mesh failed
/// to load or solve; the rest of the sweep continues without it.
#[derive(Debug)]
pub struct MeshRun {
    pub mesh_id: String,
    pub record: Option<ConvergenceRecord>,
}
