use tracing::{debug, warn};

use crate::{
    as_the_crow_flies::as_the_crow_flies_matrices,
    cache::{FileMatricesCache, MatricesCache, NoCache, cache_key},
    http_table::{HttpTableClient, HttpTableClientParams},
    travel_matrices::TravelMatrices,
    travel_matrix_provider::TravelMatrixProvider,
};

pub struct TravelMatrixClient {
    http_table_client: HttpTableClient,
    cache: Box<dyn MatricesCache>,
    fallback_speed_kmh: f64,
}

impl Default for TravelMatrixClient {
    fn default() -> Self {
        Self::new()
    }
}

impl TravelMatrixClient {
    /// Uses the file cache when `COURIER_CACHE_FOLDER` points to a folder.
    pub fn new() -> Self {
        let cache: Box<dyn MatricesCache> = match FileMatricesCache::from_env() {
            Ok(cache) => Box::new(cache),
            Err(err) => {
                debug!("TravelMatrixClient: matrix cache disabled ({err})");
                Box::new(NoCache)
            }
        };

        Self::with_cache(cache, HttpTableClientParams::default())
    }

    pub fn with_cache(cache: Box<dyn MatricesCache>, params: HttpTableClientParams) -> Self {
        let fallback_speed_kmh = params.fallback_speed_kmh;
        Self {
            http_table_client: HttpTableClient::new(params),
            cache,
            fallback_speed_kmh,
        }
    }

    pub fn fallback_speed_kmh(&self) -> f64 {
        self.fallback_speed_kmh
    }

    /// Never fails because of the provider: when it cannot answer, the
    /// straight-line matrix is returned with every pair flagged estimated.
    pub async fn fetch_matrix<P>(
        &self,
        points: &[P],
        provider: &TravelMatrixProvider,
    ) -> anyhow::Result<TravelMatrices>
    where
        for<'a> &'a P: Into<geo_types::Point>,
    {
        match provider {
            TravelMatrixProvider::AsTheCrowFlies { speed_kmh } => {
                Ok(as_the_crow_flies_matrices(points, *speed_kmh))
            }
            TravelMatrixProvider::Custom { matrices } => {
                if matrices.num_locations() != points.len() || !matrices.is_square() {
                    return Err(anyhow::anyhow!(
                        "Custom matrices cover {} locations, expected {}",
                        matrices.num_locations(),
                        points.len()
                    ));
                }
                Ok(matrices.clone())
            }
            TravelMatrixProvider::HttpTable { url, profile } => {
                let key = cache_key(points, provider);
                match self.cache.get(&key) {
                    Ok(Some(matrices)) => {
                        debug!("TravelMatrixClient: cache hit {key}");
                        return Ok(matrices);
                    }
                    Ok(None) => {}
                    Err(err) => debug!("TravelMatrixClient: cache read failed: {err}"),
                }

                match self
                    .http_table_client
                    .fetch_matrix(url, profile, points)
                    .await
                {
                    Ok(matrices) => {
                        if let Err(err) = self.cache.put(&key, &matrices) {
                            debug!("TravelMatrixClient: cache write failed: {err}");
                        }
                        Ok(matrices)
                    }
                    Err(err) => {
                        warn!(
                            "TravelMatrixClient: provider failed ({err}), using straight-line estimates"
                        );
                        let mut matrices =
                            as_the_crow_flies_matrices(points, self.fallback_speed_kmh);
                        matrices.mark_all_estimated();
                        Ok(matrices)
                    }
                }
            }
        }
    }

    /// Cost of going from `points[0]` to `points[1]` as answered by the
    /// provider itself: no cache and no straight-line fallback. Returns
    /// `(meters, seconds)`.
    pub async fn fetch_pair<P>(
        &self,
        points: &[P; 2],
        provider: &TravelMatrixProvider,
    ) -> anyhow::Result<(f64, f64)>
    where
        for<'a> &'a P: Into<geo_types::Point>,
    {
        let matrices = match provider {
            TravelMatrixProvider::AsTheCrowFlies { speed_kmh } => {
                as_the_crow_flies_matrices(points, *speed_kmh)
            }
            TravelMatrixProvider::HttpTable { url, profile } => {
                self.http_table_client
                    .fetch_matrix(url, profile, points)
                    .await?
            }
            TravelMatrixProvider::Custom { .. } => {
                anyhow::bail!("Custom matrices cannot answer pairs outside of them")
            }
        };

        if matrices.is_estimated(1) {
            anyhow::bail!("Provider could not route the pair");
        }
        Ok((matrices.distances[1], matrices.times[1]))
    }
}
