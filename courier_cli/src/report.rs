use comfy_table::{Table, presets::UTF8_FULL_CONDENSED};
use courier_optimizer::solver::plan_result::PlanResult;

pub fn routes_table(plan: &PlanResult) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED).set_header(vec![
        "Route", "Vehicle", "Driver", "Stops", "Start", "End", "Distance (km)", "Utilization",
        "Late stops",
    ]);

    for route in &plan.routes {
        let late = route
            .visits
            .iter()
            .filter(|visit| visit.lateness.is_positive())
            .count();

        table.add_row(vec![
            route.route_id.to_string(),
            route.vehicle_id.clone(),
            route.driver_id.clone(),
            route.visits.len().to_string(),
            route.start.to_string(),
            route.end.to_string(),
            format!("{:.2}", route.distance / 1000.0),
            format!("{:.0}%", route.utilization),
            late.to_string(),
        ]);
    }

    table
}

pub fn summary_table(rows: &[(String, Result<PlanResult, String>)]) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED).set_header(vec![
        "Request", "Routes", "Unassigned", "Cost", "Converged", "Degraded", "Elapsed",
    ]);

    for (name, result) in rows {
        match result {
            Ok(plan) => table.add_row(vec![
                name.clone(),
                plan.routes.len().to_string(),
                plan.unassigned.len().to_string(),
                format!("{:.2}", plan.metrics.cost.total()),
                plan.converged.to_string(),
                plan.degraded.to_string(),
                format!("{:#}", plan.metrics.elapsed),
            ]),
            Err(error) => table.add_row(vec![name.clone(), format!("failed: {error}")]),
        };
    }

    table
}
