//! Bookings.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
};
use chrono::{DateTime, Utc};
use placebook_core::{Booking, NewBooking, PlaceId, TimeSlot};
use serde::Deserialize;

use super::{ApiResult, parse_id};
use crate::auth::CurrentUser;
use crate::error::ApiError;
use crate::server::GatewayState;

/// Body of `POST /bookings`. Any other field, `user_id` included, is ignored.
#[derive(Debug, Deserialize)]
pub(crate) struct BookingRequest {
    place_id: PlaceId,
    starts_at: DateTime<Utc>,
    ends_at: DateTime<Utc>,
}

/// `POST /bookings`
pub(crate) async fn create_booking(
    State(state): State<Arc<GatewayState>>,
    CurrentUser(identity): CurrentUser,
    payload: Result<Json<BookingRequest>, JsonRejection>,
) -> ApiResult<Json<Booking>> {
    let Json(body) = payload?;
    let slot = TimeSlot::new(body.starts_at, body.ends_at)?;

    if state.store.get_place(body.place_id)?.is_none() {
        return Err(ApiError::NotFound("Place not found".to_string()));
    }

    let booking = state.store.create_booking(NewBooking {
        place_id: body.place_id,
        user_id: identity.user_id,
        slot,
    })?;

    tracing::info!(
        booking_id = %booking.id,
        place_id = %booking.place_id,
        user_id = %booking.user_id,
        "Booking created"
    );
    Ok(Json(booking))
}

/// `GET /places/{id}/bookings`
pub(crate) async fn list_bookings(
    State(state): State<Arc<GatewayState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<Booking>>> {
    let place_id: PlaceId = parse_id(&id)?;

    if state.store.get_place(place_id)?.is_none() {
        return Err(ApiError::NotFound("Place not found".to_string()));
    }

    Ok(Json(state.store.list_bookings_for_place(place_id)?))
}
