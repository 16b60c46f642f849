use crate::travel_matrices::TravelMatrices;

const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

pub fn haversine_distance<P>(from: P, to: P) -> f64
where
    P: Into<geo_types::Point>,
{
    let from: geo_types::Point = from.into();
    let to: geo_types::Point = to.into();

    let lat1_rad = from.y().to_radians();
    let lon1_rad = from.x().to_radians();
    let lat2_rad = to.y().to_radians();
    let lon2_rad = to.x().to_radians();

    let delta_lat = lat2_rad - lat1_rad;
    let delta_lon = lon2_rad - lon1_rad;

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_METERS * c
}

/// Seconds needed to cover `distance` meters at `speed_kmh`.
#[inline]
pub fn travel_time(distance: f64, speed_kmh: f64) -> f64 {
    if speed_kmh <= 0.0 {
        return 0.0;
    }

    distance / (speed_kmh / 3.6)
}

pub fn as_the_crow_flies_matrices<P>(points: &[P], speed_kmh: f64) -> TravelMatrices
where
    for<'a> &'a P: Into<geo_types::Point>,
{
    let num_points = points.len();
    let mut distances: Vec<f64> = vec![0.0; num_points * num_points];
    let mut times: Vec<f64> = vec![0.0; num_points * num_points];

    for (i, from) in points.iter().enumerate() {
        for (j, to) in points.iter().enumerate() {
            let distance = haversine_distance(from, to);
            distances[i * num_points + j] = distance;
            times[i * num_points + j] = travel_time(distance, speed_kmh);
        }
    }

    TravelMatrices {
        distances,
        times,
        estimated: vec![],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Coord(f64, f64);

    impl From<&Coord> for geo_types::Point {
        fn from(coord: &Coord) -> Self {
            geo_types::Point::new(coord.0, coord.1)
        }
    }

    #[test]
    fn test_haversine_paris_brussels() {
        let paris = geo_types::Point::new(2.3522, 48.8566);
        let brussels = geo_types::Point::new(4.3517, 50.8503);

        let distance = haversine_distance(paris, brussels);
        assert!((distance - 264_000.0).abs() < 2_000.0, "{distance}");
    }

    #[test]
    fn test_matrices_symmetric_with_zero_diagonal() {
        let points = vec![
            Coord(4.35, 50.85),
            Coord(4.40, 50.80),
            Coord(4.30, 50.90),
        ];

        let matrices = as_the_crow_flies_matrices(&points, 36.0);

        for i in 0..3 {
            assert_eq!(matrices.distances[i * 3 + i], 0.0);
            for j in 0..3 {
                assert_eq!(matrices.distances[i * 3 + j], matrices.distances[j * 3 + i]);
            }
        }

        // 36 km/h is 10 m/s
        assert!((matrices.times[1] - matrices.distances[1] / 10.0).abs() < 1e-9);
        assert_eq!(matrices.estimated_pairs(), 0);
    }
}
