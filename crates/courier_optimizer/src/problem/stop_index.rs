use rstar::{RTree, primitives::GeomWithData};

use super::{
    location::Location,
    stop::{Stop, StopIdx},
};

pub type StopIndexObject = GeomWithData<[f64; 2], StopIdx>;

/// Spatial index over stop locations.
#[derive(Clone)]
pub struct StopIndex {
    tree: RTree<StopIndexObject>,
}

impl StopIndex {
    pub fn new(locations: &[Location], stops: &[Stop]) -> Self {
        let objects = stops
            .iter()
            .enumerate()
            .map(|(index, stop)| {
                let location = &locations[stop.location_id()];
                StopIndexObject::new([location.x(), location.y()], StopIdx::new(index))
            })
            .collect();

        StopIndex {
            tree: RTree::bulk_load(objects),
        }
    }

    pub fn insert(&mut self, location: &Location, stop_id: StopIdx) {
        self.tree
            .insert(StopIndexObject::new([location.x(), location.y()], stop_id));
    }

    /// Stops ordered by planar distance to `location`.
    pub fn nearest(&self, location: &Location) -> impl Iterator<Item = StopIdx> + '_ {
        self.tree
            .nearest_neighbor_iter(&[location.x(), location.y()])
            .map(|object| object.data)
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }
}
