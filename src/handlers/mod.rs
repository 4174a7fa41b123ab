//! Request handlers.
//!
//! # Routes
//! - `GET /ping` (`GetPing`): liveness probe
//! - `GET /rolldice`, `GET /rolldice/{player}` (`RollDice`): roll a die
//! - `GET /metrics` (`Metrics`): Prometheus exposition
//!
//! Handlers share only the read-only telemetry handles.

pub mod dice;
pub mod metrics;
pub mod ping;

use axum::http::Method;

use crate::observability::TelemetryHandles;
use crate::routing::{RouteError, RouteTable, RouteTableBuilder};

pub use dice::RollDice;
pub use metrics::MetricsExport;

/// Build the service's route table.
pub fn routes(telemetry: &TelemetryHandles) -> Result<RouteTable, RouteError> {
    let dice = RollDice::new(telemetry.meter().clone());

    let mut builder = RouteTableBuilder::new();
    builder
        .register(Method::GET, "/ping", "GetPing", ping::get_ping)?
        .register(Method::GET, "/rolldice", "RollDice", dice.clone())?
        .register(Method::GET, "/rolldice/{player}", "RollDice", dice)?
        .register(
            Method::GET,
            "/metrics",
            "Metrics",
            MetricsExport::new(telemetry.meter().clone()),
        )?;
    Ok(builder.build())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::Meter;

    #[test]
    fn test_route_table() {
        let telemetry = TelemetryHandles::new("test", Meter::new().unwrap());
        let table = routes(&telemetry).unwrap();
        let registered: Vec<(String, &str)> = table
            .iter()
            .map(|r| (format!("{} {}", r.method(), r.pattern()), r.name()))
            .collect();
        assert_eq!(
            registered,
            vec![
                ("GET /ping".to_string(), "GetPing"),
                ("GET /rolldice".to_string(), "RollDice"),
                ("GET /rolldice/{player}".to_string(), "RollDice"),
                ("GET /metrics".to_string(), "Metrics"),
            ]
        );
    }
}
