use std::sync::Arc;

use courier_matrix_providers::{
    travel_matrix_client::TravelMatrixClient, travel_matrix_provider::TravelMatrixProvider,
};
use tokio::runtime::Handle;

use super::{
    location::Location,
    travel_costs::{DistanceMetric, OracleError, PairOracle, StraightLineOracle},
};

/// Asks the matrix provider for single pairs, blocking on the runtime the
/// problem was built on.
///
/// Only usable from threads outside of that runtime, such as the evaluation
/// pool. Called from within the runtime it reports itself unavailable and the
/// pair falls back to a straight-line estimate.
pub struct ProviderOracle {
    client: Arc<TravelMatrixClient>,
    provider: TravelMatrixProvider,
    handle: Handle,
}

impl ProviderOracle {
    pub fn new(client: Arc<TravelMatrixClient>, provider: TravelMatrixProvider, handle: Handle) -> Self {
        ProviderOracle {
            client,
            provider,
            handle,
        }
    }
}

impl PairOracle for ProviderOracle {
    fn cost(&self, from: &Location, to: &Location) -> Result<(f64, f64), OracleError> {
        if Handle::try_current().is_ok() {
            return Err(OracleError::Unavailable(String::from(
                "pair requested from within the runtime",
            )));
        }

        self.handle
            .block_on(self.client.fetch_pair(&[*from, *to], &self.provider))
            .map_err(|error| OracleError::Unavailable(error.to_string()))
    }
}

/// Leaves every pair to the straight-line fallback, flagged estimated.
pub struct NoOracle;

impl PairOracle for NoOracle {
    fn cost(&self, _from: &Location, _to: &Location) -> Result<(f64, f64), OracleError> {
        Err(OracleError::Unavailable(String::from(
            "provider does not answer single pairs",
        )))
    }
}

/// Oracle answering pairs outside of a precomputed matrix for `provider`.
pub fn pair_oracle(
    client: &Arc<TravelMatrixClient>,
    provider: &TravelMatrixProvider,
) -> Arc<dyn PairOracle> {
    match (provider, Handle::try_current()) {
        (TravelMatrixProvider::AsTheCrowFlies { speed_kmh }, _) => {
            Arc::new(StraightLineOracle::new(DistanceMetric::Haversine, *speed_kmh))
        }
        (TravelMatrixProvider::HttpTable { .. }, Ok(handle)) => Arc::new(ProviderOracle::new(
            Arc::clone(client),
            provider.clone(),
            handle,
        )),
        _ => Arc::new(NoOracle),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_oracle_without_runtime() {
        let client = Arc::new(TravelMatrixClient::default());
        let brussels = Location::from_lat_lon(50.85, 4.35);
        let antwerp = Location::from_lat_lon(51.22, 4.40);

        let crow = pair_oracle(&client, &TravelMatrixProvider::AsTheCrowFlies { speed_kmh: 36.0 });
        let (distance, time) = crow.cost(&brussels, &antwerp).unwrap();
        assert!((distance / 1000.0 - 41.0).abs() < 2.0, "{distance}");
        assert!((time - distance / 10.0).abs() < 1e-6);

        let table = pair_oracle(
            &client,
            &TravelMatrixProvider::HttpTable {
                url: String::from("http://127.0.0.1:9"),
                profile: String::from("driving"),
            },
        );
        assert!(table.cost(&brussels, &antwerp).is_err());
    }
}
