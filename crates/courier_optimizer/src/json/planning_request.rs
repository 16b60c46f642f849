use std::sync::Arc;

use courier_matrix_providers::travel_matrix_client::TravelMatrixClient;
use tracing::{debug, info, instrument, warn};

use crate::{
    json::types::JsonPlanningRequest,
    problem::{
        location::{Location, LocationIdx},
        planning_problem::{PlanningProblem, PlanningProblemBuilder},
        provider_oracle::pair_oracle,
        travel_costs::{DistanceMetric, StraightLineOracle, TravelCosts},
    },
    timer_debug,
};

impl JsonPlanningRequest {
    /// Builds the problem snapshot. The depot is location 0, followed by the
    /// vehicles starting elsewhere and one location per stop.
    ///
    /// Up to `matrix_threshold` locations the full matrix is fetched before
    /// returning, above it pairs are asked to the provider on demand and
    /// memoized.
    #[instrument(skip_all, level = "debug", fields(depot_id = %self.depot_id))]
    pub async fn build_problem(
        self,
        client: &Arc<TravelMatrixClient>,
        matrix_threshold: usize,
    ) -> anyhow::Result<PlanningProblem> {
        let provider = self.cost_provider.unwrap_or_default();

        let mut locations = vec![Location::from(&self.depot)];
        let depot_location_id = LocationIdx::new(0);

        let vehicles = self
            .vehicles
            .into_iter()
            .map(|vehicle| {
                let start_location_id = match &vehicle.start_location {
                    Some(start) => {
                        locations.push(Location::from(start));
                        LocationIdx::new(locations.len() - 1)
                    }
                    None => depot_location_id,
                };
                vehicle.into_vehicle(start_location_id)
            })
            .collect::<Vec<_>>();

        let stops = self
            .stops
            .into_iter()
            .map(|stop| {
                locations.push(Location::from(&stop.location));
                stop.into_stop(LocationIdx::new(locations.len() - 1))
            })
            .collect::<Vec<_>>();

        let oracle = pair_oracle(client, &provider);
        let fallback = StraightLineOracle::new(DistanceMetric::Haversine, client.fallback_speed_kmh());

        let travel_costs = if locations.len() <= matrix_threshold {
            let matrices = timer_debug!(
                "fetch_matrix",
                client.fetch_matrix(&locations, &provider).await?
            );
            let estimated = matrices.estimated_pairs();
            if estimated > 0 {
                warn!("{estimated} travel pairs are straight-line estimates");
            }
            TravelCosts::from_matrices(matrices, oracle, fallback)
        } else {
            info!(
                "{} locations above the matrix threshold of {matrix_threshold}, costs are computed on demand",
                locations.len()
            );
            TravelCosts::lazy(oracle, fallback)
        };

        debug!(
            "Problem with {} stops, {} vehicles and {} drivers",
            stops.len(),
            vehicles.len(),
            self.drivers.len()
        );

        let mut builder = PlanningProblemBuilder::default();
        builder
            .set_depot_id(self.depot_id)
            .set_date(self.date)
            .set_locations(locations)
            .set_stops(stops)
            .set_vehicles(vehicles)
            .set_drivers(self.drivers.into_iter().map(Into::into).collect())
            .set_travel_costs(travel_costs);

        Ok(builder.build())
    }
}
