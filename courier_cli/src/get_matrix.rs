use std::{fs::File, io::BufReader, path::PathBuf};

use clap::Args;
use courier_matrix_providers::{
    travel_matrix_client::TravelMatrixClient, travel_matrix_provider::TravelMatrixProvider,
};
use courier_optimizer::{json::types::JsonPlanningRequest, problem::location::Location};
use indicatif::ProgressBar;
use tracing::warn;

use crate::file_utils::request_files;

#[derive(Args)]
pub struct GetMatrixArgs {
    /// Planning request, or folder of requests, whose matrices are fetched
    /// into the cache
    #[arg(short = 'i', long)]
    input: PathBuf,
}

async fn fetch_matrix(client: &TravelMatrixClient, file: &PathBuf) -> anyhow::Result<()> {
    let request: JsonPlanningRequest = serde_json::from_reader(BufReader::new(File::open(file)?))?;

    let mut locations = vec![Location::from(&request.depot)];
    locations.extend(
        request
            .vehicles
            .iter()
            .filter_map(|vehicle| vehicle.start_location.as_ref())
            .map(Location::from),
    );
    locations.extend(request.stops.iter().map(|stop| Location::from(&stop.location)));

    let provider = request
        .cost_provider
        .unwrap_or_else(TravelMatrixProvider::from_env);
    let matrices = client.fetch_matrix(&locations, &provider).await?;
    if matrices.estimated_pairs() > 0 {
        warn!("{:?}: {} estimated pairs", file, matrices.estimated_pairs());
    }

    Ok(())
}

pub async fn run(args: GetMatrixArgs) -> anyhow::Result<()> {
    let paths = request_files(&args.input)?;
    let bar = ProgressBar::new(paths.len() as u64);
    let client = TravelMatrixClient::default();

    for path in &paths {
        if let Err(error) = fetch_matrix(&client, path).await {
            warn!("{:?}: {error}", path);
        }
        bar.inc(1);
    }
    bar.finish();

    Ok(())
}
