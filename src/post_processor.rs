use std::io::Write;

use nalgebra::DVector;

use crate::{
    datatypes::{ConvergenceRecord, Mesh, MeshRun},
    error::HematiteError,
    problems::Coefficient,
};

/// Writes the per-mesh error file
///
/// The first line is the decimal value of the energy-norm error, which is
/// the whole contract: downstream convergence tooling reads exactly that.
///
/// # Arguments
/// * `record` - The per-mesh convergence record
/// * `output_dir` - The directory to write into
pub fn write_error_file(record: &ConvergenceRecord, output_dir: &str) -> Result<(), HematiteError> {
    let path = output_path(output_dir, &record.mesh_id, "_error.txt");

    let mut error_file = match std::fs::File::create(&path) {
        Ok(f) => f,
        Err(err) => {
            return Err(HematiteError::Output(format!(
                "Failed to create {}: {}",
                path, err
            )));
        }
    };

    if let Err(err) = writeln!(error_file, "{:.16e}", record.energy_error) {
        return Err(HematiteError::Output(format!(
            "Failed to write {}: {}",
            path, err
        )));
    }

    println!("info: wrote error file {}", path);
    Ok(())
}

/// Writes the nodal solution alongside the exact solution as a CSV
///
/// # Arguments
/// * `mesh` - The solved mesh
/// * `uh` - The nodal solution vector
/// * `exact` - The exact solution for the reference column
/// * `mesh_id` - Identifier the output file name is derived from
/// * `output_dir` - The directory to write into
pub fn write_solution_csv(
    mesh: &Mesh,
    uh: &DVector<f64>,
    exact: Coefficient,
    mesh_id: &str,
    output_dir: &str,
) -> Result<(), HematiteError> {
    let path = output_path(output_dir, mesh_id, "_solution.csv");

    let mut solution_file = match std::fs::File::create(&path) {
        Ok(f) => f,
        Err(err) => {
            return Err(HematiteError::Output(format!(
                "Failed to create {}: {}",
                path, err
            )));
        }
    };

    let mut contents = String::from("x,y,uh,u\n");
    for (i, vertex) in mesh.vertices.iter().enumerate() {
        contents.push_str(&format!(
            "{x},{y},{uh},{u}\n",
            x = vertex.x,
            y = vertex.y,
            uh = uh[i],
            u = exact(vertex.x, vertex.y),
        ));
    }

    if let Err(err) = solution_file.write_all(contents.as_bytes()) {
        return Err(HematiteError::Output(format!(
            "Failed to write {}: {}",
            path, err
        )));
    }

    println!("info: wrote solution output to {}", path);
    Ok(())
}

/// Renders the convergence table
///
/// One fixed-width row per mesh: identifier, vertex count, worst quality Q,
/// mesh diameter h, energy error e_h and observed order p. The order cell is
/// blank on the last row (an order needs a next refinement) and N/A wherever
/// a record is missing. The mean of the computed orders closes the table.
pub fn render_convergence_table(
    runs: &[MeshRun],
    orders: &[Option<f64>],
    mean: Option<f64>,
) -> String {
    let rule = "-".repeat(104);
    let mut table = String::new();

    table.push_str(&format!("{}\n", "=".repeat(104)));
    table.push_str("CONVERGENCE TABLE\n");
    table.push_str(&format!("{}\n\n", "=".repeat(104)));
    table.push_str(&format!(
        "{:<15} {:<12} {:<20} {:<20} {:<23} {:<12}\n",
        "Mesh", "N", "Quality Q", "Step h", "Error e_h", "Order p"
    ));
    table.push_str(&format!("{}\n", rule));

    for (i, run) in runs.iter().enumerate() {
        let (n, q, h, e) = match &run.record {
            Some(r) => (
                r.vertex_count.to_string(),
                format!("{:.16}", r.quality),
                format!("{:.16}", r.diameter),
                format!("{:.16e}", r.energy_error),
            ),
            None => (
                "N/A".to_owned(),
                "N/A".to_owned(),
                "N/A".to_owned(),
                "N/A".to_owned(),
            ),
        };

        let p = if i + 1 == runs.len() {
            String::new()
        } else {
            match orders.get(i) {
                Some(Some(order)) => format!("{:.4}", order),
                _ => "N/A".to_owned(),
            }
        };

        table.push_str(&format!(
            "{:<15} {:<12} {:<20} {:<20} {:<23} {:<12}\n",
            run.mesh_id, n, q, h, e, p
        ));
    }

    table.push_str(&format!("{}\n", rule));
    match mean {
        Some(mean) => table.push_str(&format!("Mean observed order: {:.4}\n", mean)),
        None => table.push_str("Mean observed order: N/A\n"),
    }

    table
}

/// Writes the rendered convergence table next to the per-mesh outputs
pub fn write_table(table: &str, output_dir: &str) -> Result<(), HematiteError> {
    let path = format!("{}/convergence_table.txt", output_dir);

    if let Err(err) = std::fs::write(&path, table) {
        return Err(HematiteError::Output(format!(
            "Failed to write {}: {}",
            path, err
        )));
    }

    println!("info: wrote convergence table to {}", path);
    Ok(())
}

/// Builds an output path from a mesh identifier, swapping its extension
/// for the given suffix
fn output_path(output_dir: &str, mesh_id: &str, suffix: &str) -> String {
    let stem = std::path::Path::new(mesh_id)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| mesh_id.to_owned());

    format!("{}/{}{}", output_dir, stem, suffix)
}
