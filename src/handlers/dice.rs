//! Dice rolling endpoint.

use std::collections::HashMap;

use axum::body::Body;
use axum::extract::Path;
use axum::http::Request;
use axum::response::IntoResponse;
use axum::RequestExt;
use futures_util::future::BoxFuture;
use metrics::Label;
use rand::Rng;
use tracing_opentelemetry::OpenTelemetrySpanExt;

use crate::http::request::RequestContext;
use crate::observability::Meter;
use crate::routing::{Handler, HandlerResult};

/// Counter of rolls, labelled by the rolled value.
pub const DICE_ROLLS: &str = "dice_rolls_total";

/// `GET /rolldice` and `GET /rolldice/{player}`: roll a six-sided die.
#[derive(Clone, Debug)]
pub struct RollDice {
    meter: Meter,
}

impl RollDice {
    pub fn new(meter: Meter) -> Self {
        Self { meter }
    }
}

impl Handler for RollDice {
    fn call(&self, cx: RequestContext, req: Request<Body>) -> BoxFuture<'static, HandlerResult> {
        let meter = self.meter.clone();
        Box::pin(roll_dice(meter, cx, req))
    }
}

async fn roll_dice(meter: Meter, cx: RequestContext, mut req: Request<Body>) -> HandlerResult {
    let player = req
        .extract_parts::<Path<HashMap<String, String>>>()
        .await
        .ok()
        .and_then(|Path(mut params)| params.remove("player"));

    let roll: u8 = rand::thread_rng().gen_range(1..=6);

    match &player {
        Some(player) => tracing::info!(player = %player, roll, "{} is rolling the dice", player),
        None => tracing::info!(roll, "Anonymous player is rolling the dice"),
    }
    cx.span().set_attribute("roll.value", i64::from(roll));
    meter
        .counter(DICE_ROLLS, vec![Label::new("roll_value", roll.to_string())])
        .increment(1);

    Ok(format!("{}\n", roll).into_response())
}
