//! # Placebook Core
//!
//! Core types, configuration, and storage for Placebook.
//!
//! This crate provides:
//! - The booking data model (users, places, bookings, time slots)
//! - Configuration loading and validation (JSON5 format)
//! - The persistence gateway trait and its sled-backed implementation
//! - Input validation and sanitization

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod store;
pub mod types;
pub mod validation;

pub use config::{Config, ConfigError};
pub use store::{Persistence, SledStore, StoreError};
pub use types::{
    Booking, BookingId, NewBooking, NewPlace, NewUser, Place, PlaceId, PublicUser, Role, TimeSlot,
    User, UserId,
};
pub use validation::ValidationError;

