use json::JsonValue;

use crate::error::HematiteError;

/// A parsed convergence-study job
///
/// `meshes` is expected to list mesh files coarsest first: the order of the
/// rows and the pairing of the convergence orders follow this list as-is.
#[derive(Debug)]
pub struct JobConfig {
    pub problem: String,
    pub meshes: Vec<String>,
    pub dirichlet_labels: Vec<i32>,
    pub output_dir: String,
}

/// Parses the job json into a JsonValue object
///
/// # Arguments
/// * `job_file` - The path to the job file
///
/// # Returns
/// A JsonValue object
fn load_job_file(job_file: &str) -> Result<JsonValue, HematiteError> {
    let file_string = match std::fs::read_to_string(job_file) {
        Ok(f) => f,
        Err(_err) => {
            return Err(HematiteError::Input(format!(
                "Unable to open job file {}",
                job_file
            )))
        }
    };

    let job_json = match json::parse(&file_string) {
        Ok(f) => f,
        Err(err) => {
            return Err(HematiteError::Input(format!(
                "Error in job file json: {err}"
            )))
        }
    };

    if !job_json.has_key("problem") {
        return Err(HematiteError::Input(
            "Job json missing problem field".to_string(),
        ));
    }
    if !job_json.has_key("meshes") {
        return Err(HematiteError::Input(
            "Job json missing meshes field".to_string(),
        ));
    }
    if !job_json.has_key("dirichlet_labels") {
        return Err(HematiteError::Input(
            "Job json missing dirichlet_labels field".to_string(),
        ));
    }

    Ok(job_json)
}

/// Parses a JobConfig from the job json
///
/// # Arguments
/// * `job_file` - The path to the job file
///
/// # Returns
/// A JobConfig instance
pub fn load_job(job_file: &str) -> Result<JobConfig, HematiteError> {
    let job_json = load_job_file(job_file)?;

    let problem = match job_json["problem"].as_str() {
        Some(p) => p.to_owned(),
        None => {
            return Err(HematiteError::Input(
                "Bad value for problem field in job json".to_owned(),
            ))
        }
    };

    let mut meshes: Vec<String> = Vec::new();
    for entry in job_json["meshes"].members() {
        match entry.as_str() {
            Some(path) => meshes.push(path.to_owned()),
            None => {
                return Err(HematiteError::Input(
                    "Non-string entry in meshes list".to_owned(),
                ))
            }
        }
    }
    if meshes.is_empty() {
        return Err(HematiteError::Input(
            "Job json meshes list is empty".to_owned(),
        ));
    }

    let mut dirichlet_labels: Vec<i32> = Vec::new();
    for entry in job_json["dirichlet_labels"].members() {
        match entry.as_i32() {
            Some(label) => dirichlet_labels.push(label),
            None => {
                return Err(HematiteError::Input(
                    "Non-integer entry in dirichlet_labels list".to_owned(),
                ))
            }
        }
    }

    let output_dir = job_json["output_dir"]
        .as_str()
        .unwrap_or("results")
        .to_owned();

    println!(
        "info: loaded job with {} meshes, problem '{}'",
        meshes.len(),
        problem
    );

    Ok(JobConfig {
        problem,
        meshes,
        dirichlet_labels,
        output_dir,
    })
}
