use crate::{
    datatypes::{BoundaryEdge, Mesh, Triangle, Vertex},
    error::HematiteError,
};

/// Parses a FreeFem++ style .msh file into a Mesh
///
/// # Arguments
/// * `mesh_file` - The path to the mesh file
///
/// # Returns
/// A Mesh instance with 0-based indices
pub fn read_mesh(mesh_file: &str) -> Result<Mesh, HematiteError> {
    let contents = match std::fs::read_to_string(mesh_file) {
        Ok(c) => c,
        Err(err) => {
            return Err(HematiteError::Input(format!(
                "Unable to open mesh file {}: {}",
                mesh_file, err
            )))
        }
    };

    let mesh = parse_mesh(&contents)?;

    println!(
        "info: loaded {} vertices, {} triangles, {} boundary edges from {}",
        mesh.vertices.len(),
        mesh.triangles.len(),
        mesh.boundary_edges.len(),
        mesh_file
    );

    Ok(mesh)
}

/// Parses the text contents of a mesh file
///
/// The format is line-oriented: a `nv nt nbe` header, then `nv` vertex lines
/// (`x y` with an optional trailing label), then `nt` triangle lines
/// (`i1 i2 i3 region`), then `nbe` boundary edge lines (`i1 i2 label`).
/// Indices are 1-based in the file and converted to 0-based here.
pub fn parse_mesh(contents: &str) -> Result<Mesh, HematiteError> {
    let mut lines = contents.lines().map(str::trim).filter(|l| !l.is_empty());

    let header = match lines.next() {
        Some(l) => l,
        None => return Err(HematiteError::MalformedMesh("mesh file is empty".to_owned())),
    };

    let counts: Vec<usize> = parse_fields(header, "header")?;
    if counts.len() != 3 {
        return Err(HematiteError::MalformedMesh(format!(
            "header must hold 'nv nt nbe', got {} fields",
            counts.len()
        )));
    }
    let (nv, nt, nbe) = (counts[0], counts[1], counts[2]);

    if nv < 3 {
        return Err(HematiteError::MalformedMesh(format!(
            "mesh declares {} vertices; at least 3 are required",
            nv
        )));
    }
    if nt < 1 {
        return Err(HematiteError::MalformedMesh(
            "mesh declares no triangles".to_owned(),
        ));
    }

    let data_lines: Vec<&str> = lines.collect();
    if data_lines.len() != nv + nt + nbe {
        return Err(HematiteError::MalformedMesh(format!(
            "header declares {} data lines ({} vertices, {} triangles, {} edges), found {}",
            nv + nt + nbe,
            nv,
            nt,
            nbe,
            data_lines.len()
        )));
    }

    // Vertex lines: x y, with an optional trailing integer label that some
    // mesher variants emit and this reader ignores.
    let mut vertices: Vec<Vertex> = Vec::with_capacity(nv);
    for (i, line) in data_lines[..nv].iter().enumerate() {
        let fields: Vec<f64> = parse_fields(line, "vertex")?;
        if fields.len() < 2 {
            return Err(HematiteError::MalformedMesh(format!(
                "vertex {} holds {} fields; expected at least 'x y'",
                i + 1,
                fields.len()
            )));
        }
        vertices.push(Vertex {
            x: fields[0],
            y: fields[1],
        });
    }

    let mut triangles: Vec<Triangle> = Vec::with_capacity(nt);
    for (i, line) in data_lines[nv..nv + nt].iter().enumerate() {
        let fields: Vec<i64> = parse_fields(line, "triangle")?;
        if fields.len() < 3 {
            return Err(HematiteError::MalformedMesh(format!(
                "triangle {} holds {} fields; expected 'i1 i2 i3 region'",
                i + 1,
                fields.len()
            )));
        }
        // The trailing region label is parsed but not retained
        let v = [
            convert_index(fields[0], nv, "triangle", i)?,
            convert_index(fields[1], nv, "triangle", i)?,
            convert_index(fields[2], nv, "triangle", i)?,
        ];
        triangles.push(Triangle { vertices: v });
    }

    let mut boundary_edges: Vec<BoundaryEdge> = Vec::with_capacity(nbe);
    for (i, line) in data_lines[nv + nt..].iter().enumerate() {
        let fields: Vec<i64> = parse_fields(line, "boundary edge")?;
        if fields.len() < 3 {
            return Err(HematiteError::MalformedMesh(format!(
                "boundary edge {} holds {} fields; expected 'i1 i2 label'",
                i + 1,
                fields.len()
            )));
        }
        let v = [
            convert_index(fields[0], nv, "boundary edge", i)?,
            convert_index(fields[1], nv, "boundary edge", i)?,
        ];
        boundary_edges.push(BoundaryEdge {
            vertices: v,
            label: fields[2] as i32,
        });
    }

    Ok(Mesh {
        vertices,
        triangles,
        boundary_edges,
    })
}

/// Splits a line into whitespace-separated numeric fields
fn parse_fields<T: std::str::FromStr>(line: &str, kind: &str) -> Result<Vec<T>, HematiteError> {
    line.split_whitespace()
        .map(|tok| {
            tok.parse().map_err(|_| {
                HematiteError::MalformedMesh(format!(
                    "non-numeric value '{}' in {} line '{}'",
                    tok, kind, line
                ))
            })
        })
        .collect()
}

/// Converts a 1-based file index into a 0-based vertex index, range-checked
fn convert_index(raw: i64, nv: usize, kind: &str, entry: usize) -> Result<usize, HematiteError> {
    if raw < 1 || raw as usize > nv {
        return Err(HematiteError::MalformedMesh(format!(
            "{} {} references vertex {} outside 1..={}",
            kind,
            entry + 1,
            raw,
            nv
        )));
    }
    Ok(raw as usize - 1)
}

/// Calculates the length of the edge between two vertices
pub fn edge_length(a: &Vertex, b: &Vertex) -> f64 {
    f64::sqrt(f64::powi(b.x - a.x, 2) + f64::powi(b.y - a.y, 2))
}

/// Calculates the unsigned area of a triangle via the cross product
pub fn triangle_area(p1: &Vertex, p2: &Vertex, p3: &Vertex) -> f64 {
    0.5 * f64::abs((p2.x - p1.x) * (p3.y - p1.y) - (p3.x - p1.x) * (p2.y - p1.y))
}

/// Calculates the diameter of a triangle (its longest edge)
pub fn triangle_diameter(p1: &Vertex, p2: &Vertex, p3: &Vertex) -> f64 {
    edge_length(p1, p2)
        .max(edge_length(p2, p3))
        .max(edge_length(p3, p1))
}

/// Calculates the shape quality of a triangle
///
/// Q_T = (sqrt(3)/6) * (h_T / r_T), where h_T is the triangle diameter and
/// r_T = 2 * area / perimeter is the inradius. Q_T = 1 for an equilateral
/// triangle and grows without bound as the triangle degenerates.
pub fn triangle_quality(p1: &Vertex, p2: &Vertex, p3: &Vertex) -> f64 {
    let diameter = triangle_diameter(p1, p2, p3);
    let perimeter = edge_length(p1, p2) + edge_length(p2, p3) + edge_length(p3, p1);
    let area = triangle_area(p1, p2, p3);

    if perimeter == 0.0 {
        return f64::INFINITY;
    }
    let inradius = 2.0 * area / perimeter;
    if inradius == 0.0 {
        return f64::INFINITY;
    }

    (f64::sqrt(3.0) / 6.0) * (diameter / inradius)
}

/// Calculates the worst triangle quality Q and the mesh diameter h
///
/// # Arguments
/// * `mesh` - The mesh to measure
///
/// # Returns
/// A (Q, h) tuple. Both are maxima over all triangles: a single bad triangle
/// dominates the reported quality.
pub fn mesh_characteristics(mesh: &Mesh) -> (f64, f64) {
    let mut quality: f64 = 0.0;
    let mut diameter: f64 = 0.0;

    for triangle in &mesh.triangles {
        let p1 = &mesh.vertices[triangle.vertices[0]];
        let p2 = &mesh.vertices[triangle.vertices[1]];
        let p3 = &mesh.vertices[triangle.vertices[2]];

        quality = quality.max(triangle_quality(p1, p2, p3));
        diameter = diameter.max(triangle_diameter(p1, p2, p3));
    }

    (quality, diameter)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_TRIANGLE_SQUARE: &str = "\
4 2 4
0.0 0.0
1.0 0.0
1.0 1.0
0.0 1.0
1 2 3 0
1 3 4 0
1 2 1
2 3 2
3 4 3
4 1 4
";

    #[test]
    fn parses_counts_and_converts_indices() {
        let mesh = parse_mesh(TWO_TRIANGLE_SQUARE).unwrap();

        assert_eq!(mesh.vertices.len(), 4);
        assert_eq!(mesh.triangles.len(), 2);
        assert_eq!(mesh.boundary_edges.len(), 4);

        assert_eq!(mesh.triangles[0].vertices, [0, 1, 2]);
        assert_eq!(mesh.triangles[1].vertices, [0, 2, 3]);
        assert_eq!(mesh.boundary_edges[3].vertices, [3, 0]);
        assert_eq!(mesh.boundary_edges[3].label, 4);

        // Every converted index must land in [0, nv)
        let nv = mesh.vertices.len();
        for triangle in &mesh.triangles {
            assert!(triangle.vertices.iter().all(|&i| i < nv));
        }
        for edge in &mesh.boundary_edges {
            assert!(edge.vertices.iter().all(|&i| i < nv));
        }
    }

    #[test]
    fn accepts_labeled_vertex_lines() {
        let labeled = "\
3 1 0
0.0 0.0 1
1.0 0.0 1
0.0 1.0 2
1 2 3 0
";
        let mesh = parse_mesh(labeled).unwrap();
        assert_eq!(mesh.vertices[2], Vertex { x: 0.0, y: 1.0 });
    }

    #[test]
    fn rejects_count_mismatch() {
        // One boundary edge line missing
        let truncated = "\
3 1 2
0.0 0.0
1.0 0.0
0.0 1.0
1 2 3 0
1 2 1
";
        let err = parse_mesh(truncated).unwrap_err();
        assert!(matches!(err, HematiteError::MalformedMesh(_)));

        // One data line too many
        let padded = format!("{}3 1 1\n", TWO_TRIANGLE_SQUARE);
        let err = parse_mesh(&padded).unwrap_err();
        assert!(matches!(err, HematiteError::MalformedMesh(_)));
    }

    #[test]
    fn rejects_out_of_range_indices() {
        let bad_triangle = "\
3 1 0
0.0 0.0
1.0 0.0
0.0 1.0
1 2 4 0
";
        let err = parse_mesh(bad_triangle).unwrap_err();
        assert!(matches!(err, HematiteError::MalformedMesh(_)));

        let zero_index = "\
3 1 1
0.0 0.0
1.0 0.0
0.0 1.0
1 2 3 0
0 2 1
";
        let err = parse_mesh(zero_index).unwrap_err();
        assert!(matches!(err, HematiteError::MalformedMesh(_)));
    }

    #[test]
    fn rejects_undersized_meshes() {
        let err = parse_mesh("2 1 0\n0.0 0.0\n1.0 0.0\n1 2 2 0\n").unwrap_err();
        assert!(matches!(err, HematiteError::MalformedMesh(_)));

        let err = parse_mesh("3 0 0\n0.0 0.0\n1.0 0.0\n0.0 1.0\n").unwrap_err();
        assert!(matches!(err, HematiteError::MalformedMesh(_)));
    }

    #[test]
    fn equilateral_triangle_has_unit_quality() {
        let p1 = Vertex { x: 0.0, y: 0.0 };
        let p2 = Vertex { x: 1.0, y: 0.0 };
        let p3 = Vertex {
            x: 0.5,
            y: f64::sqrt(3.0) / 2.0,
        };

        assert!((triangle_quality(&p1, &p2, &p3) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn right_triangle_quality_matches_closed_form() {
        let p1 = Vertex { x: 0.0, y: 0.0 };
        let p2 = Vertex { x: 1.0, y: 0.0 };
        let p3 = Vertex { x: 0.0, y: 1.0 };

        // h = sqrt(2), r = (2 - sqrt(2)) / 2, Q = (sqrt(3)/3) * (1 + sqrt(2))
        let expected = (f64::sqrt(3.0) / 3.0) * (1.0 + f64::sqrt(2.0));
        assert!((triangle_quality(&p1, &p2, &p3) - expected).abs() < 1e-12);
    }

    #[test]
    fn degenerate_triangle_quality_is_infinite() {
        let p1 = Vertex { x: 0.0, y: 0.0 };
        let p2 = Vertex { x: 1.0, y: 0.0 };
        let p3 = Vertex { x: 2.0, y: 0.0 };

        assert!(triangle_quality(&p1, &p2, &p3).is_infinite());
    }

    #[test]
    fn square_mesh_characteristics() {
        let mesh = parse_mesh(TWO_TRIANGLE_SQUARE).unwrap();
        let (quality, diameter) = mesh_characteristics(&mesh);

        assert!((diameter - f64::sqrt(2.0)).abs() < 1e-12);
        let expected_q = (f64::sqrt(3.0) / 3.0) * (1.0 + f64::sqrt(2.0));
        assert!((quality - expected_q).abs() < 1e-12);
    }
}
