use std::path::PathBuf;

use clap::Parser;

mod convergence;
mod datatypes;
mod error;
mod job;
mod mesher;
mod post_processor;
mod problems;
mod solver;

use error::HematiteError;

#[derive(Parser)]
#[command(about = "P1 finite element convergence studies on triangular meshes")]
struct Cli {
    /// Path to the job json describing the study
    job: PathBuf,

    /// Overrides the job's output directory
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn main() {
    let cli = Cli::parse();

    if let Err(err) = run(&cli) {
        println!("error: {}", err);
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<(), HematiteError> {
    let mut job = job::load_job(&cli.job.to_string_lossy())?;
    if let Some(output) = &cli.output {
        job.output_dir = output.to_string_lossy().into_owned();
    }

    let problem = problems::by_name(&job.problem)?;
    println!("info: running problem '{}'", problem.name);

    let runs = convergence::run_study(&job, &problem)?;
    let orders = convergence::convergence_orders(&runs);
    let mean = convergence::mean_order(&orders);

    let table = post_processor::render_convergence_table(&runs, &orders, mean);
    println!("{}", table);
    post_processor::write_table(&table, &job.output_dir)?;

    Ok(())
}
