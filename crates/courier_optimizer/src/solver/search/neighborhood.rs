use rand::{Rng, rngs::SmallRng, seq::IteratorRandom};

use crate::solver::{
    moves::{
        insert::InsertOperator,
        inter_relocate::{InterRelocateOperator, InterRelocateParams},
        inter_swap::{InterSwapOperator, InterSwapParams},
        or_opt::{MAX_SEGMENT_LENGTH, OrOptOperator, OrOptParams},
        r#move::Move,
        two_opt::{TwoOptOperator, TwoOptParams},
        two_opt_star::{TwoOptStarOperator, TwoOptStarParams},
    },
    solution::{route::RouteIdx, working_solution::WorkingSolution},
};

/// Draws one move uniformly among the operators, then its positions
/// uniformly among the unfrozen ones. `None` when the drawn operator has no
/// move in this solution; feasibility is left to `delta_cost`.
pub fn random_move(solution: &WorkingSolution, rng: &mut SmallRng) -> Option<Move> {
    match rng.random_range(0..6) {
        0 => random_two_opt(solution, rng),
        1 => random_or_opt(solution, rng),
        2 => random_inter_relocate(solution, rng),
        3 => random_inter_swap(solution, rng),
        4 => random_two_opt_star(solution, rng),
        _ => random_insert(solution, rng).or_else(|| random_or_opt(solution, rng)),
    }
}

/// Random route with at least `min_unfrozen` stops after its frozen prefix.
fn pick_route(solution: &WorkingSolution, rng: &mut SmallRng, min_unfrozen: usize) -> Option<RouteIdx> {
    solution
        .route_ids()
        .filter(|&route_id| {
            let route = solution.route(route_id);
            route.len() >= route.frozen() + min_unfrozen
        })
        .choose(rng)
}

fn pick_route_pair(solution: &WorkingSolution, rng: &mut SmallRng) -> Option<(RouteIdx, RouteIdx)> {
    let first = pick_route(solution, rng, 1)?;
    let second = solution
        .route_ids()
        .filter(|&route_id| route_id != first)
        .choose(rng)?;
    Some((first, second))
}

fn random_two_opt(solution: &WorkingSolution, rng: &mut SmallRng) -> Option<Move> {
    let route_id = pick_route(solution, rng, 2)?;
    let route = solution.route(route_id);

    let from = rng.random_range(route.frozen()..route.len() - 1);
    let to = rng.random_range(from + 1..route.len());
    Some(Move::TwoOpt(TwoOptOperator::new(TwoOptParams {
        route_id,
        from,
        to,
    })))
}

fn random_or_opt(solution: &WorkingSolution, rng: &mut SmallRng) -> Option<Move> {
    let route_id = pick_route(solution, rng, 2)?;
    let route = solution.route(route_id);
    let frozen = route.frozen();

    let length = rng.random_range(1..=MAX_SEGMENT_LENGTH.min(route.len() - frozen - 1));
    let from = rng.random_range(frozen..=route.len() - length);
    let to = (frozen..=route.len() - length)
        .filter(|&to| to != from)
        .choose(rng)?;

    Some(Move::OrOpt(OrOptOperator::new(OrOptParams {
        route_id,
        from,
        length,
        to,
    })))
}

fn random_inter_relocate(solution: &WorkingSolution, rng: &mut SmallRng) -> Option<Move> {
    let (from_route_id, to_route_id) = pick_route_pair(solution, rng)?;
    let from_route = solution.route(from_route_id);
    let to_route = solution.route(to_route_id);

    Some(Move::InterRelocate(InterRelocateOperator::new(
        InterRelocateParams {
            from_route_id,
            from_position: rng.random_range(from_route.frozen()..from_route.len()),
            to_route_id,
            to_position: rng.random_range(to_route.frozen()..=to_route.len()),
        },
    )))
}

fn random_inter_swap(solution: &WorkingSolution, rng: &mut SmallRng) -> Option<Move> {
    let (first_route_id, second_route_id) = pick_route_pair(solution, rng)?;
    let first_route = solution.route(first_route_id);
    let second_route = solution.route(second_route_id);
    if second_route.len() <= second_route.frozen() {
        return None;
    }

    Some(Move::InterSwap(InterSwapOperator::new(InterSwapParams {
        first_route_id,
        first_position: rng.random_range(first_route.frozen()..first_route.len()),
        second_route_id,
        second_position: rng.random_range(second_route.frozen()..second_route.len()),
    })))
}

fn random_two_opt_star(solution: &WorkingSolution, rng: &mut SmallRng) -> Option<Move> {
    let (first_route_id, second_route_id) = pick_route_pair(solution, rng)?;
    let first_route = solution.route(first_route_id);
    let second_route = solution.route(second_route_id);

    let first_position = rng.random_range(first_route.frozen()..first_route.len());
    let second_position = rng.random_range(second_route.frozen()..=second_route.len());

    Some(Move::TwoOptStar(TwoOptStarOperator::new(TwoOptStarParams {
        first_route_id,
        first_position,
        second_route_id,
        second_position,
    })))
}

fn random_insert(solution: &WorkingSolution, rng: &mut SmallRng) -> Option<Move> {
    let stop_id = solution.unassigned().iter().copied().choose(rng)?;
    let enforce_zones = solution.constraints().hard().enforce_zones;
    let route_id = solution
        .problem()
        .eligible_resources(stop_id, enforce_zones)
        .map(RouteIdx::from)
        .choose(rng)?;

    let route = solution.route(route_id);
    let position = rng.random_range(route.frozen()..=route.len());
    Some(Move::Insert(InsertOperator::new(route_id, stop_id, position)))
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;

    use super::*;
    use crate::{
        problem::capacity::Capacity,
        test_utils::{self, TestRoute},
    };

    #[test]
    fn test_random_moves_keep_cost_in_sync() {
        let problem = test_utils::create_default_problem(12, 3, Capacity::weight(10.0));
        let mut solution = test_utils::create_test_working_solution(
            problem,
            vec![
                TestRoute {
                    resource_id: 0,
                    stop_ids: vec![0, 1, 2, 3],
                },
                TestRoute {
                    resource_id: 1,
                    stop_ids: vec![4, 5, 6, 7],
                },
            ],
        );
        let mut rng = SmallRng::seed_from_u64(42);

        let mut applied = 0;
        for _ in 0..500 {
            let Some(mv) = random_move(&solution, &mut rng) else {
                continue;
            };
            let Some(delta) = mv.delta_cost(&solution) else {
                continue;
            };

            let before = solution.cost().total();
            let _ = mv.apply(&mut solution);
            applied += 1;
            assert!((before + delta - solution.cost().total()).abs() < 1e-6);
        }

        assert!(applied > 0);
        assert!(solution.cost().approx_eq(&solution.evaluate(), 1e-6));
    }

    #[test]
    fn test_frozen_prefix_is_never_drawn() {
        let problem = test_utils::create_default_problem(4, 1, Capacity::weight(10.0));
        let mut solution = test_utils::create_test_working_solution(
            problem,
            vec![TestRoute {
                resource_id: 0,
                stop_ids: vec![0, 1, 2, 3],
            }],
        );
        solution.route_mut(RouteIdx::new(0)).set_frozen(2);
        solution.refresh_route(RouteIdx::new(0));
        let mut rng = SmallRng::seed_from_u64(3);

        for _ in 0..200 {
            if let Some(mv) = random_move(&solution, &mut rng) {
                let mut candidate = solution.clone();
                let _ = mv.apply(&mut candidate);
                assert_eq!(
                    &candidate.route(RouteIdx::new(0)).stops()[..2],
                    &solution.route(RouteIdx::new(0)).stops()[..2]
                );
            }
        }
    }
}
