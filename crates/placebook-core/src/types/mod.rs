//! Core types used throughout Placebook.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::validation::ValidationError;

macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl $name {
            /// Big-endian key bytes, so sled iteration follows id order.
            #[must_use]
            pub const fn to_key(self) -> [u8; 8] {
                self.0.to_be_bytes()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = ValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim()
                    .parse::<u64>()
                    .map(Self)
                    .map_err(|_| ValidationError::InvalidId(s.to_string()))
            }
        }
    };
}

numeric_id!(
    /// Unique identifier for a registered user.
    UserId
);
numeric_id!(
    /// Unique identifier for a bookable place.
    PlaceId
);
numeric_id!(
    /// Unique identifier for a booking.
    BookingId
);

/// User role for access control.
///
/// Closed set: anything else read from storage or a token is rejected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Regular account: can browse places and book them.
    #[default]
    User,
    /// Can manage places and promote other users.
    Admin,
}

impl Role {
    /// Check if this role has admin privileges.
    #[must_use]
    pub const fn is_admin(self) -> bool {
        matches!(self, Self::Admin)
    }

    /// Stable string form, as stored and embedded in tokens.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "user" => Ok(Self::User),
            "admin" => Ok(Self::Admin),
            _ => Err(ValidationError::UnknownRole(s.to_string())),
        }
    }
}

/// Registered user account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Unique user ID.
    pub id: UserId,
    /// Login email, stored normalized (trimmed, lowercase).
    pub email: String,
    /// Argon2 PHC string. Never leaves the server.
    pub password_hash: String,
    /// User role.
    pub role: Role,
    /// When the user registered.
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Create a safe version of user for API responses (no password hash).
    #[must_use]
    pub fn to_public(&self) -> PublicUser {
        PublicUser {
            id: self.id,
            email: self.email.clone(),
            role: self.role,
            created_at: self.created_at,
        }
    }
}

/// Public user representation (for API responses).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicUser {
    /// Unique user ID.
    pub id: UserId,
    /// Email address.
    pub email: String,
    /// User role.
    pub role: Role,
    /// When created.
    pub created_at: DateTime<Utc>,
}

/// Insert payload for a user; the store assigns id and timestamp.
#[derive(Debug, Clone)]
pub struct NewUser {
    /// Normalized email.
    pub email: String,
    /// Already-hashed password.
    pub password_hash: String,
    /// Initial role.
    pub role: Role,
}

/// A bookable place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Place {
    /// Unique place ID.
    pub id: PlaceId,
    /// Display name, unique across places.
    pub name: String,
    /// Free-form location.
    pub location: String,
    /// Stored image filename, if one was uploaded.
    pub image: Option<String>,
    /// When the place was created.
    pub created_at: DateTime<Utc>,
}

/// Insert payload for a place.
#[derive(Debug, Clone)]
pub struct NewPlace {
    /// Display name.
    pub name: String,
    /// Location.
    pub location: String,
    /// Stored image filename.
    pub image: Option<String>,
}

/// Half-open time interval `[starts_at, ends_at)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSlot {
    /// Inclusive start.
    pub starts_at: DateTime<Utc>,
    /// Exclusive end.
    pub ends_at: DateTime<Utc>,
}

impl TimeSlot {
    /// Build a slot, rejecting empty or inverted intervals.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidTimeSlot` if `ends_at <= starts_at`.
    pub fn new(starts_at: DateTime<Utc>, ends_at: DateTime<Utc>) -> Result<Self, ValidationError> {
        if ends_at <= starts_at {
            return Err(ValidationError::InvalidTimeSlot(format!(
                "ends_at ({ends_at}) must be after starts_at ({starts_at})"
            )));
        }
        Ok(Self { starts_at, ends_at })
    }

    /// Length of the slot.
    #[must_use]
    pub fn duration(&self) -> chrono::Duration {
        self.ends_at - self.starts_at
    }

    /// Whether two slots share any instant. Touching endpoints do not overlap.
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.starts_at < other.ends_at && other.starts_at < self.ends_at
    }
}

/// A reservation of a place for a time slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    /// Unique booking ID.
    pub id: BookingId,
    /// Booked place.
    pub place_id: PlaceId,
    /// Owner; always the authenticated caller at creation time.
    pub user_id: UserId,
    /// Reserved interval.
    #[serde(flatten)]
    pub slot: TimeSlot,
    /// When the booking was made.
    pub created_at: DateTime<Utc>,
}

/// Insert payload for a booking.
#[derive(Debug, Clone)]
pub struct NewBooking {
    /// Booked place.
    pub place_id: PlaceId,
    /// Owner.
    pub user_id: UserId,
    /// Reserved interval.
    pub slot: TimeSlot,
}
