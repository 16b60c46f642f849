use courier_optimizer::{
    dispatch::{
        actor::DispatchHandle,
        controller::{DispatchController, DispatchParams, UrgentStop},
        route_state::RouteStatus,
    },
    error::DispatchError,
    problem::{
        capacity::Capacity,
        location::Location,
        stop::{Priority, StopBuilder, StopOutcome},
        time_window::TimeWindow,
    },
    solver::{constraints::constraint_set::ConstraintSet, solver::Solver},
};
use jiff::SignedDuration;

mod test_utils;

/// Two vans, eight stops due before noon. Every stop has at least two hours
/// of slack once planned.
async fn running_plan() -> DispatchHandle {
    let stops = test_utils::create_stops(8, |_, builder| {
        builder.set_time_window(TimeWindow::between(
            test_utils::at(8, 0),
            test_utils::at(12, 0),
        ));
    });
    let problem = test_utils::create_problem(
        test_utils::create_location_grid(3, 4),
        stops,
        test_utils::create_vehicles(2, Capacity::weight(6.0)),
        test_utils::create_drivers(2),
    );

    let (plan, solution) = tokio::task::spawn_blocking(move || {
        Solver::new(problem, ConstraintSet::default(), test_utils::solver_params(9))
            .solve_with_solution()
    })
    .await
    .unwrap()
    .unwrap();
    assert!(plan.unassigned.is_empty());

    DispatchHandle::spawn(DispatchController::new(solution, DispatchParams::default()), 32)
}

fn urgent(external_id: &str, x: f64, y: f64) -> UrgentStop {
    let mut stop = StopBuilder::default();
    stop.set_external_id(external_id)
        .set_demand(Capacity::weight(1.0))
        .set_service_duration(SignedDuration::from_mins(5))
        .set_priority(Priority::Urgent);

    UrgentStop {
        location: Location::from_cartesian(x, y),
        stop,
    }
}

#[tokio::test]
async fn test_urgent_insertion_within_slack() {
    let handle = running_plan().await;
    let routes = handle.routes().await.unwrap();
    for view in &routes {
        if !view.route.visits.is_empty() {
            handle.dispatch(view.route.route_id).await.unwrap();
            handle.start_route(view.route.route_id).await.unwrap();
        }
    }
    let before = handle.routes().await.unwrap();

    let proposals = handle.insert_urgent(urgent("urgent-1", 2.0, 1.0), None).await.unwrap();

    assert!(!proposals.is_empty());
    let best = proposals[0].clone();
    assert!(best.added_delay <= SignedDuration::from_hours(2));

    let route = handle.accept_insertion(best.id).await.unwrap();

    let previous = &before[best.route_id].route;
    let kept: Vec<&str> = route
        .visits
        .iter()
        .map(|visit| visit.stop_id.as_str())
        .filter(|stop_id| *stop_id != "urgent-1")
        .collect();
    let expected: Vec<&str> = previous
        .visits
        .iter()
        .map(|visit| visit.stop_id.as_str())
        .collect();
    assert_eq!(kept, expected);
    assert_eq!(route.visits[0].stop_id, previous.visits[0].stop_id);
    assert!(route.load.fits_within(&Capacity::weight(6.0)));
    assert!(route.visits.iter().all(|visit| !visit.lateness.is_positive()));
}

#[tokio::test]
async fn test_breakdown_hands_stops_over() {
    let handle = running_plan().await;
    let routes = handle.routes().await.unwrap();
    let (broken, other) = match (routes[0].route.visits.len(), routes[1].route.visits.len()) {
        (0, _) | (_, 0) => panic!("Expected both vans to be used"),
        _ => (routes[0].route.clone(), routes[1].route.clone()),
    };

    handle.dispatch(broken.route_id).await.unwrap();
    let first = broken.visits[0].clone();
    handle
        .on_delivery_confirmed(first.stop_id.clone(), StopOutcome::Delivered, first.departure)
        .await
        .unwrap();

    let proposals = handle
        .reassign_route(broken.route_id, "flat tyre")
        .await
        .unwrap();
    let views = handle.routes().await.unwrap();

    assert_eq!(views[broken.route_id].status, RouteStatus::Completed);
    assert_eq!(views[broken.route_id].completed_stops, vec![first.stop_id.clone()]);
    assert_eq!(
        views[other.route_id].route.visits.len(),
        other.visits.len() + proposals.len()
    );
    assert!(views[other.route_id].route.load.fits_within(&Capacity::weight(6.0)));
    assert!(
        views[other.route_id]
            .route
            .visits
            .iter()
            .all(|visit| visit.stop_id != first.stop_id)
    );
}

#[tokio::test]
async fn test_events_on_closed_route_are_rejected() {
    let handle = running_plan().await;
    let routes = handle.routes().await.unwrap();
    let route = routes
        .iter()
        .find(|view| !view.route.visits.is_empty())
        .unwrap()
        .route
        .clone();

    handle.reassign_route(route.route_id, "driver sick").await.unwrap();

    assert!(matches!(
        handle.dispatch(route.route_id).await,
        Err(DispatchError::InvalidTransition {
            from: RouteStatus::Completed,
            ..
        })
    ));
}
