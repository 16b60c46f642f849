use std::{
    hash::{Hash, Hasher},
    io::{BufWriter, Write},
    path::PathBuf,
};

use fxhash::FxHasher64;

use crate::{travel_matrices::TravelMatrices, travel_matrix_provider::TravelMatrixProvider};

pub const CACHE_FOLDER_ENV_VAR: &str = "COURIER_CACHE_FOLDER";

fn hash_points<H, P>(points: &[P], hasher: &mut H)
where
    H: Hasher,
    for<'a> &'a P: Into<geo_types::Point>,
{
    points.len().hash(hasher);
    for point in points {
        let point = point.into();
        hasher.write_u64(point.x().to_bits());
        hasher.write_u64(point.y().to_bits());
    }
}

pub fn cache_key<P>(points: &[P], provider: &TravelMatrixProvider) -> String
where
    for<'a> &'a P: Into<geo_types::Point>,
{
    let mut hasher = FxHasher64::default();

    hash_points(points, &mut hasher);
    provider.hash(&mut hasher);

    format!("{:016x}.json", hasher.finish())
}

pub trait MatricesCache: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<TravelMatrices>, anyhow::Error>;
    fn put(&self, key: &str, matrices: &TravelMatrices) -> Result<(), anyhow::Error>;
}

/// Stores matrices as JSON files in a folder.
pub struct FileMatricesCache {
    folder: PathBuf,
}

impl FileMatricesCache {
    pub fn new(folder: impl Into<PathBuf>) -> Result<Self, anyhow::Error> {
        let folder = folder.into();
        if !folder.is_dir() {
            return Err(anyhow::anyhow!(
                "Path {} is not a directory",
                folder.display()
            ));
        }

        Ok(Self { folder })
    }

    pub fn from_env() -> Result<Self, anyhow::Error> {
        let folder = std::env::var(CACHE_FOLDER_ENV_VAR)?;
        Self::new(folder)
    }
}

impl MatricesCache for FileMatricesCache {
    fn get(&self, key: &str) -> Result<Option<TravelMatrices>, anyhow::Error> {
        let file_path = self.folder.join(key);

        if !file_path.is_file() {
            return Ok(None);
        }

        let file = std::fs::File::open(file_path)?;
        let matrices: TravelMatrices = serde_json::from_reader(std::io::BufReader::new(file))?;

        Ok(Some(matrices))
    }

    fn put(&self, key: &str, matrices: &TravelMatrices) -> Result<(), anyhow::Error> {
        let file = std::fs::File::create(self.folder.join(key))?;
        let mut writer = BufWriter::with_capacity(64 * 1024, file);
        serde_json::to_writer(&mut writer, matrices)?;
        writer.flush()?;

        Ok(())
    }
}

pub struct NoCache;

impl MatricesCache for NoCache {
    fn get(&self, _key: &str) -> Result<Option<TravelMatrices>, anyhow::Error> {
        Ok(None)
    }

    fn put(&self, _key: &str, _matrices: &TravelMatrices) -> Result<(), anyhow::Error> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Depot(f64, f64);

    impl From<&Depot> for geo_types::Point {
        fn from(depot: &Depot) -> Self {
            geo_types::Point::new(depot.0, depot.1)
        }
    }

    #[test]
    fn test_cache_key_depends_on_provider() {
        let points = vec![Depot(4.35, 50.85)];

        let first = cache_key(&points, &TravelMatrixProvider::AsTheCrowFlies { speed_kmh: 40.0 });
        let second = cache_key(&points, &TravelMatrixProvider::AsTheCrowFlies { speed_kmh: 50.0 });
        let again = cache_key(&points, &TravelMatrixProvider::AsTheCrowFlies { speed_kmh: 40.0 });

        assert_ne!(first, second);
        assert_eq!(first, again);
        assert!(first.ends_with(".json"));
    }

    #[test]
    fn test_file_cache_stores_and_reads_back() {
        let folder = std::env::temp_dir().join(format!("courier-cache-{}", std::process::id()));
        std::fs::create_dir_all(&folder).unwrap();

        let cache = FileMatricesCache::new(&folder).unwrap();
        let matrices = TravelMatrices {
            distances: vec![0.0, 10.0, 12.0, 0.0],
            times: vec![0.0, 1.0, 2.0, 0.0],
            estimated: vec![],
        };

        assert!(cache.get("missing.json").unwrap().is_none());
        cache.put("entry.json", &matrices).unwrap();
        assert_eq!(cache.get("entry.json").unwrap(), Some(matrices));

        std::fs::remove_dir_all(&folder).unwrap();
    }

    #[test]
    fn test_file_cache_rejects_missing_folder() {
        let result = FileMatricesCache::new("/definitely/not/a/folder");
        assert!(result.is_err());
    }
}
