use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::{
    as_the_crow_flies::{haversine_distance, travel_time},
    travel_matrices::TravelMatrices,
};

#[derive(Debug, Error)]
pub enum HttpTableError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Table service answered with code {0}")]
    Code(String),

    #[error("Table has {actual} rows, expected {expected}")]
    Shape { expected: usize, actual: usize },
}

#[derive(Deserialize, Debug)]
pub(crate) struct TableResponse {
    pub code: String,
    #[serde(default)]
    pub durations: Vec<Vec<Option<f64>>>,
    #[serde(default)]
    pub distances: Vec<Vec<Option<f64>>>,
}

pub struct HttpTableClientParams {
    pub timeout: Duration,
    /// Speed used to fill pairs the service could not route.
    pub fallback_speed_kmh: f64,
}

impl Default for HttpTableClientParams {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            fallback_speed_kmh: 40.0,
        }
    }
}

pub struct HttpTableClient {
    params: HttpTableClientParams,
    client: reqwest::Client,
}

impl HttpTableClient {
    pub fn new(params: HttpTableClientParams) -> Self {
        let client = reqwest::Client::builder()
            .timeout(params.timeout)
            .build()
            .unwrap_or_default();

        Self { params, client }
    }

    pub async fn fetch_matrix<P>(
        &self,
        url: &str,
        profile: &str,
        points: &[P],
    ) -> Result<TravelMatrices, HttpTableError>
    where
        for<'a> &'a P: Into<geo_types::Point>,
    {
        let points: Vec<geo_types::Point> = points.iter().map(|p| p.into()).collect();
        let coordinates = points
            .iter()
            .map(|p| format!("{},{}", p.x(), p.y()))
            .collect::<Vec<_>>()
            .join(";");

        let request_url = format!(
            "{}/table/v1/{}/{}",
            url.trim_end_matches('/'),
            profile,
            coordinates
        );

        debug!(points = points.len(), "HttpTable: requesting matrix");

        let response = self
            .client
            .get(request_url)
            .query(&[("annotations", "duration,distance")])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(HttpTableError::Api { status, message });
        }

        let table: TableResponse = response.json().await?;
        into_matrices(table, &points, self.params.fallback_speed_kmh)
    }
}

/// Flattens a table response. Pairs the service left empty are filled with
/// a straight-line estimate and flagged.
pub(crate) fn into_matrices(
    table: TableResponse,
    points: &[geo_types::Point],
    fallback_speed_kmh: f64,
) -> Result<TravelMatrices, HttpTableError> {
    if table.code != "Ok" {
        return Err(HttpTableError::Code(table.code));
    }

    let n = points.len();
    if table.durations.len() != n {
        return Err(HttpTableError::Shape {
            expected: n,
            actual: table.durations.len(),
        });
    }

    let mut distances = vec![0.0; n * n];
    let mut times = vec![0.0; n * n];
    let mut estimated = vec![false; n * n];

    for i in 0..n {
        for j in 0..n {
            let index = i * n + j;
            let duration = table
                .durations
                .get(i)
                .and_then(|row| row.get(j).copied().flatten());
            let distance = table
                .distances
                .get(i)
                .and_then(|row| row.get(j).copied().flatten());

            match (distance, duration) {
                (Some(distance), Some(duration)) => {
                    distances[index] = distance;
                    times[index] = duration;
                }
                _ if i == j => {}
                _ => {
                    let distance = haversine_distance(points[i], points[j]);
                    distances[index] = distance;
                    times[index] = travel_time(distance, fallback_speed_kmh);
                    estimated[index] = true;
                }
            }
        }
    }

    if !estimated.iter().any(|&e| e) {
        estimated.clear();
    }

    Ok(TravelMatrices {
        distances,
        times,
        estimated,
    })
}
