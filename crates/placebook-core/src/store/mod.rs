//! Persistence gateway.
//!
//! Handlers only see the [`Persistence`] trait; the process wires in a
//! concrete store once at startup and shares it behind an `Arc`.

mod sled_store;

pub use sled_store::SledStore;

use thiserror::Error;

use crate::types::{
    Booking, NewBooking, NewPlace, NewUser, Place, PlaceId, User, UserId,
};

/// Storage errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The storage backend failed.
    #[error("Storage backend error: {0}")]
    Backend(#[from] sled::Error),

    /// A record could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A uniqueness constraint was violated.
    #[error("{entity} with {field} '{value}' already exists")]
    Conflict {
        /// Entity kind.
        entity: &'static str,
        /// Unique field.
        field: &'static str,
        /// Conflicting value.
        value: String,
    },

    /// Update target does not exist.
    #[error("{entity} {id} not found")]
    NotFound {
        /// Entity kind.
        entity: &'static str,
        /// Missing id.
        id: u64,
    },

    /// Update target changed since the caller read it.
    #[error("{entity} {id} was modified concurrently")]
    Stale {
        /// Entity kind.
        entity: &'static str,
        /// Record id.
        id: u64,
    },
}

/// Create/read/update operations for users, places and bookings.
///
/// No business logic lives here: callers validate input first. There is no
/// delete path for any entity.
pub trait Persistence: Send + Sync {
    /// Insert a user. Fails with `Conflict` if the email is taken.
    ///
    /// # Errors
    ///
    /// Returns error on conflict or backend failure.
    fn create_user(&self, user: NewUser) -> Result<User, StoreError>;

    /// Look up a user by id.
    ///
    /// # Errors
    ///
    /// Returns error on backend failure or an undecodable record.
    fn get_user(&self, id: UserId) -> Result<Option<User>, StoreError>;

    /// Look up a user by normalized email.
    ///
    /// # Errors
    ///
    /// Returns error on backend failure or an undecodable record.
    fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    /// Overwrite an existing user. Email is immutable.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the user does not exist.
    fn update_user(&self, user: &User) -> Result<(), StoreError>;

    /// All users in id order.
    ///
    /// # Errors
    ///
    /// Returns error on backend failure or an undecodable record.
    fn list_users(&self) -> Result<Vec<User>, StoreError>;

    /// Number of users holding the admin role.
    ///
    /// # Errors
    ///
    /// Returns error on backend failure or an undecodable record.
    fn count_admins(&self) -> Result<usize, StoreError> {
        Ok(self
            .list_users()?
            .iter()
            .filter(|u| u.role.is_admin())
            .count())
    }

    /// Insert a place. Fails with `Conflict` if the name is taken.
    ///
    /// # Errors
    ///
    /// Returns error on conflict or backend failure.
    fn create_place(&self, place: NewPlace) -> Result<Place, StoreError>;

    /// Look up a place by id.
    ///
    /// # Errors
    ///
    /// Returns error on backend failure or an undecodable record.
    fn get_place(&self, id: PlaceId) -> Result<Option<Place>, StoreError>;

    /// Replace `current` with `updated`, re-indexing the name if it changed.
    ///
    /// The write only happens if the stored record still equals `current`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if missing, `Stale` if the record changed since
    /// `current` was read, `Conflict` if the new name is taken.
    fn update_place(&self, current: &Place, updated: &Place) -> Result<(), StoreError>;

    /// All places in id order.
    ///
    /// # Errors
    ///
    /// Returns error on backend failure or an undecodable record.
    fn list_places(&self) -> Result<Vec<Place>, StoreError>;

    /// Insert a booking.
    ///
    /// No overlap check is made against existing bookings.
    ///
    /// # Errors
    ///
    /// Returns error on backend failure.
    fn create_booking(&self, booking: NewBooking) -> Result<Booking, StoreError>;

    /// Bookings for one place in creation order.
    ///
    /// # Errors
    ///
    /// Returns error on backend failure or an undecodable record.
    fn list_bookings_for_place(&self, place_id: PlaceId) -> Result<Vec<Booking>, StoreError>;
}
