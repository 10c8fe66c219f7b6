use nalgebra::DVector;

use crate::{
    datatypes::{ConvergenceRecord, Mesh, MeshRun},
    error::HematiteError,
    job::JobConfig,
    mesher, post_processor,
    problems::Problem,
    solver,
};

/// Assembles, solves and measures one mesh
///
/// # Arguments
/// * `mesh` - The loaded mesh
/// * `mesh_id` - Identifier used in reports (normally the file name)
/// * `problem` - The PDE instance
/// * `dirichlet_labels` - Boundary labels subject to penalization
///
/// # Returns
/// The nodal solution and the per-mesh convergence record
pub fn solve_on_mesh(
    mesh: &Mesh,
    mesh_id: &str,
    problem: &Problem,
    dirichlet_labels: &[i32],
) -> Result<(DVector<f64>, ConvergenceRecord), HematiteError> {
    let system = solver::assemble(mesh, problem, dirichlet_labels)?;
    let uh = solver::solve_system(&system)?;
    let energy_error = solver::energy_norm_error(&uh, &system, mesh, problem.exact);
    let (quality, diameter) = mesher::mesh_characteristics(mesh);

    let record = ConvergenceRecord {
        mesh_id: mesh_id.to_owned(),
        vertex_count: mesh.vertices.len(),
        triangle_count: mesh.triangles.len(),
        quality,
        diameter,
        energy_error,
    };

    println!(
        "info: {}: N = {}, nt = {}, h = {:.6}, e_h = {:.6e}",
        record.mesh_id, record.vertex_count, record.triangle_count, record.diameter, record.energy_error
    );

    Ok((uh, record))
}

/// Runs the convergence study described by a job
///
/// Mesh files are processed in job order, which is expected to go coarsest to
/// finest. A failure on one mesh (malformed file, degenerate element,
/// singular system) is reported and recorded as a missing data point; it does
/// not abort the sweep. Output errors do abort, since every following mesh
/// would hit the same broken destination.
pub fn run_study(job: &JobConfig, problem: &Problem) -> Result<Vec<MeshRun>, HematiteError> {
    if let Err(err) = std::fs::create_dir_all(&job.output_dir) {
        return Err(HematiteError::Output(format!(
            "Unable to create output directory {}: {}",
            job.output_dir, err
        )));
    }

    let mut runs: Vec<MeshRun> = Vec::new();

    for (i, mesh_path) in job.meshes.iter().enumerate() {
        println!(
            "info: [{}/{}] solving on {}...",
            i + 1,
            job.meshes.len(),
            mesh_path
        );

        let mesh_id = mesh_file_name(mesh_path);
        let record = match run_one(mesh_path, &mesh_id, problem, job) {
            Ok(record) => Some(record),
            Err(err @ HematiteError::Output(_)) => return Err(err),
            Err(err) => {
                println!("warning: skipping {}: {}", mesh_path, err);
                None
            }
        };

        runs.push(MeshRun { mesh_id, record });
    }

    Ok(runs)
}

fn run_one(
    mesh_path: &str,
    mesh_id: &str,
    problem: &Problem,
    job: &JobConfig,
) -> Result<ConvergenceRecord, HematiteError> {
    let mesh = mesher::read_mesh(mesh_path)?;
    let (uh, record) = solve_on_mesh(&mesh, mesh_id, problem, &job.dirichlet_labels)?;

    post_processor::write_error_file(&record, &job.output_dir)?;
    post_processor::write_solution_csv(&mesh, &uh, problem.exact, mesh_id, &job.output_dir)?;

    Ok(record)
}

fn mesh_file_name(mesh_path: &str) -> String {
    std::path::Path::new(mesh_path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| mesh_path.to_owned())
}

/// Computes the observed convergence order for each consecutive pair of runs
///
/// p_i = ln(e_i / e_{i+1}) / ln(h_i / h_{i+1}), using the actual h ratio
/// rather than assuming exact 2x refinement. A pair with a missing record, a
/// non-positive error, or a degenerate h ratio yields None.
pub fn convergence_orders(runs: &[MeshRun]) -> Vec<Option<f64>> {
    runs.windows(2)
        .map(|pair| match (&pair[0].record, &pair[1].record) {
            (Some(coarse), Some(fine)) => pair_order(coarse, fine),
            _ => None,
        })
        .collect()
}

fn pair_order(coarse: &ConvergenceRecord, fine: &ConvergenceRecord) -> Option<f64> {
    if coarse.energy_error <= 0.0 || fine.energy_error <= 0.0 {
        return None;
    }
    if coarse.diameter <= 0.0 || fine.diameter <= 0.0 {
        return None;
    }

    let h_ratio = coarse.diameter / fine.diameter;
    if (h_ratio - 1.0).abs() < 1e-12 {
        return None;
    }

    Some(f64::ln(coarse.energy_error / fine.energy_error) / f64::ln(h_ratio))
}

/// Computes the arithmetic mean of the computed orders, if any
pub fn mean_order(orders: &[Option<f64>]) -> Option<f64> {
    let computed: Vec<f64> = orders.iter().flatten().copied().collect();
    if computed.is_empty() {
        return None;
    }
    Some(computed.iter().sum::<f64>() / computed.len() as f64)
}
