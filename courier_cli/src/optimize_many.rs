use std::{fs::File, io::BufReader, path::PathBuf, sync::Arc, time::Duration};

use clap::Args;
use courier_optimizer::{
    json::types::JsonPlanningRequest,
    service::{collaborators::InMemoryCollaborators, planning_service::PlanningService},
    solver::{search::termination::Termination, solver_params::SolverParams},
};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use crate::{file_utils::request_files, parsers, report};

#[derive(Args)]
pub struct OptimizeManyArgs {
    /// Folder of planning requests, each one planned as an independent run
    #[arg(short, long)]
    requests: PathBuf,

    #[arg(short, long, value_parser = parsers::parse_duration, default_value = "30s")]
    timeout: jiff::SignedDuration,
}

pub async fn run(args: OptimizeManyArgs) -> anyhow::Result<()> {
    let paths = request_files(&args.requests)?;
    info!("Optimizing {} requests from {:?}", paths.len(), args.requests);

    let mut collaborators = InMemoryCollaborators::default();
    let mut runs = Vec::with_capacity(paths.len());
    let mut names = Vec::with_capacity(paths.len());
    for path in &paths {
        let request: JsonPlanningRequest =
            serde_json::from_reader(BufReader::new(File::open(path)?))?;
        runs.push((
            request.depot_id.clone(),
            request.date,
            request.constraints.clone().unwrap_or_default(),
        ));
        names.push(format!("{} {}", request.depot_id, request.date));
        collaborators.add_request(request);
    }

    let collaborators = Arc::new(collaborators);
    let service = PlanningService::new(
        Arc::clone(&collaborators),
        Arc::clone(&collaborators),
        Arc::clone(&collaborators),
    )
    .with_solver_params(SolverParams {
        terminations: vec![Termination::Duration(args.timeout)],
        ..SolverParams::default()
    });

    let bar = ProgressBar::new_spinner();
    bar.enable_steady_tick(Duration::from_millis(200));
    bar.set_style(ProgressStyle::default_spinner().template("{spinner} planning ({elapsed})")?);

    let results = service.optimize_many(runs).await;
    bar.finish_and_clear();

    let rows: Vec<_> = names
        .into_iter()
        .zip(results)
        .map(|(name, result)| (name, result.map_err(|error| error.to_string())))
        .collect();
    println!("{}", report::summary_table(&rows));

    Ok(())
}
