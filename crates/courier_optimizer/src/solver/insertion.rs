use std::fmt::Display;

use rand::{rngs::SmallRng, seq::SliceRandom};
use serde::Serialize;

use crate::{
    problem::stop::StopIdx,
    solver::{
        constraints::capacity_constraint::is_capacity_feasible,
        moves::{insert::InsertOperator, r#move::Move},
        solution::{
            route::{RouteChange, RouteIdx},
            working_solution::WorkingSolution,
        },
    },
};

/// Cheapest feasible position of a stop in one route.
#[derive(Debug, Clone, Copy)]
pub struct Insertion {
    pub route_id: RouteIdx,
    pub stop_id: StopIdx,
    pub position: usize,
    /// Route cost increase, the unassigned penalty is not included.
    pub added_cost: f64,
    pub change: RouteChange,
}

impl Insertion {
    pub fn into_move(self) -> Move {
        Move::Insert(InsertOperator::new(self.route_id, self.stop_id, self.position))
    }
}

/// Calls `consumer` with every feasible position of `stop_id` in the route,
/// the frozen prefix excluded.
pub fn for_each_insertion<C>(
    solution: &WorkingSolution,
    stop_id: StopIdx,
    route_id: RouteIdx,
    mut consumer: C,
) where
    C: FnMut(Insertion),
{
    let problem = solution.problem();
    let constraints = solution.constraints();
    let route = solution.route(route_id);

    if !problem.is_eligible(route.resource_id(), stop_id, constraints.hard().enforce_zones)
        || !is_capacity_feasible(problem, constraints, route, stop_id)
    {
        return;
    }

    for position in route.frozen()..=route.len() {
        if let Some(change) =
            route.evaluate_change(problem, constraints, &[stop_id], position, position)
        {
            consumer(Insertion {
                route_id,
                stop_id,
                position,
                added_cost: change.cost - route.cost(),
                change,
            });
        }
    }
}

pub fn best_insertion_in_route(
    solution: &WorkingSolution,
    stop_id: StopIdx,
    route_id: RouteIdx,
) -> Option<Insertion> {
    let mut best: Option<Insertion> = None;
    for_each_insertion(solution, stop_id, route_id, |insertion| {
        if best.is_none_or(|best| insertion.added_cost < best.added_cost) {
            best = Some(insertion);
        }
    });
    best
}

pub fn best_insertion(
    solution: &WorkingSolution,
    stop_id: StopIdx,
    route_ids: impl IntoIterator<Item = RouteIdx>,
) -> Option<Insertion> {
    route_ids
        .into_iter()
        .filter_map(|route_id| best_insertion_in_route(solution, stop_id, route_id))
        .min_by(|a, b| a.added_cost.total_cmp(&b.added_cost))
}

#[derive(Default, Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum InsertionOrder {
    /// Highest priority first, then earliest deadline.
    #[default]
    Deadline,
    /// Largest demand first.
    Demand,
    Random,
}

impl Display for InsertionOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Deadline => write!(f, "Deadline"),
            Self::Demand => write!(f, "Demand"),
            Self::Random => write!(f, "Random"),
        }
    }
}

/// Repair pass placing unassigned stops one by one at their cheapest
/// feasible position.
#[derive(Default)]
pub struct CheapestInsertion {
    order: InsertionOrder,
}

impl CheapestInsertion {
    pub fn new(order: InsertionOrder) -> Self {
        CheapestInsertion { order }
    }

    fn sort_stops(&self, solution: &WorkingSolution, stops: &mut [StopIdx], rng: &mut SmallRng) {
        let problem = solution.problem();
        match self.order {
            InsertionOrder::Deadline => stops.sort_by(|&a, &b| {
                let (a, b) = (problem.stop(a), problem.stop(b));
                b.priority()
                    .weight()
                    .total_cmp(&a.priority().weight())
                    .then_with(|| match (a.time_window().end(), b.time_window().end()) {
                        (Some(a), Some(b)) => a.cmp(&b),
                        (Some(_), None) => std::cmp::Ordering::Less,
                        (None, Some(_)) => std::cmp::Ordering::Greater,
                        (None, None) => std::cmp::Ordering::Equal,
                    })
            }),
            InsertionOrder::Demand => stops.sort_by(|&a, &b| {
                problem
                    .stop(b)
                    .demand()
                    .weight
                    .total_cmp(&problem.stop(a).demand().weight)
            }),
            InsertionOrder::Random => stops.shuffle(rng),
        }
    }

    /// Returns the number of stops placed.
    pub fn insert_unassigned(&self, solution: &mut WorkingSolution, rng: &mut SmallRng) -> usize {
        let mut stops: Vec<StopIdx> = solution.unassigned().iter().copied().collect();
        self.sort_stops(solution, &mut stops, rng);

        let enforce_zones = solution.constraints().hard().enforce_zones;
        let mut inserted = 0;
        for stop_id in stops {
            let candidates: Vec<RouteIdx> = solution
                .problem()
                .eligible_resources(stop_id, enforce_zones)
                .map(RouteIdx::from)
                .collect();

            if let Some(insertion) = best_insertion(solution, stop_id, candidates) {
                let _ = insertion.into_move().apply(solution);
                inserted += 1;
            }
        }

        inserted
    }
}
