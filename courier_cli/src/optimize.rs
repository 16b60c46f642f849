use std::{fs::File, io::BufReader, path::PathBuf, sync::Arc};

use clap::Args;
use courier_matrix_providers::{
    travel_matrix_client::TravelMatrixClient, travel_matrix_provider::TravelMatrixProvider,
};
use courier_optimizer::{
    json::types::JsonPlanningRequest,
    solver::{
        search::termination::Termination,
        solver::Solver,
        solver_params::{SolverParams, Threads},
    },
};
use tracing::info;

use crate::{parsers, report};

#[derive(Args)]
pub struct OptimizeArgs {
    /// Planning request to optimize
    #[arg(short = 'i', long)]
    input: PathBuf,

    #[arg(short, long, value_parser = parsers::parse_duration, default_value = "30s")]
    timeout: jiff::SignedDuration,

    /// Threads evaluating local search moves
    #[arg(long, default_value_t = 1)]
    threads: u8,

    #[arg(long, short = 'n')]
    iterations: Option<usize>,

    #[arg(long)]
    seed: Option<u64>,

    /// Writes the plan as JSON
    #[arg(long, short = 'o')]
    out: Option<PathBuf>,
}

impl OptimizeArgs {
    pub fn solver_params(&self) -> SolverParams {
        let mut terminations = vec![Termination::Duration(self.timeout)];
        if let Some(iterations) = self.iterations {
            terminations.push(Termination::Iterations(iterations));
        }

        SolverParams {
            terminations,
            seed: self.seed,
            local_search_threads: Threads::Multi(self.threads.max(1) as usize),
            ..SolverParams::default()
        }
    }
}

pub async fn run(args: OptimizeArgs) -> anyhow::Result<()> {
    let file = File::open(&args.input)?;
    let mut request: JsonPlanningRequest = serde_json::from_reader(BufReader::new(file))?;
    request
        .cost_provider
        .get_or_insert_with(TravelMatrixProvider::from_env);
    let constraints = request.constraints.clone().unwrap_or_default();
    let params = args.solver_params();

    let client = Arc::new(TravelMatrixClient::default());
    let problem = request.build_problem(&client, params.matrix_threshold).await?;
    info!(
        "Loaded {} stops and {} resources from {:?}",
        problem.num_stops(),
        problem.resources().len(),
        args.input
    );

    let plan = tokio::task::spawn_blocking(move || Solver::new(problem, constraints, params).solve())
        .await??;

    println!("{}", report::routes_table(&plan));
    info!(
        "Finished: routes = {}, cost = {:.2}, unassigned = {}, converged = {}",
        plan.routes.len(),
        plan.metrics.cost.total(),
        plan.unassigned.len(),
        plan.converged
    );

    if let Some(out) = args.out {
        if let Some(parent) = out.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(out, serde_json::to_string_pretty(&plan)?)?;
    }

    Ok(())
}
