use std::fmt::Display;

#[derive(Debug)]
pub enum HematiteError {
    Input(String),
    MalformedMesh(String),
    DegenerateElement(String),
    SingularSystem(String),
    Output(String),
}

impl Display for HematiteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (err_name, value) = match self {
            HematiteError::Input(v) => ("Input", v),
            HematiteError::MalformedMesh(v) => ("Malformed Mesh", v),
            HematiteError::DegenerateElement(v) => ("Degenerate Element", v),
            HematiteError::SingularSystem(v) => ("Singular System", v),
            HematiteError::Output(v) => ("Output", v),
        };

        write!(f, "{} error: {}", err_name, value)
    }
}
