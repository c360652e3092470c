//! Sled-backed persistence.

use std::path::Path;

use chrono::Utc;
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::{Persistence, StoreError};
use crate::types::{
    Booking, BookingId, NewBooking, NewPlace, NewUser, Place, PlaceId, User, UserId,
};

const USERS: &str = "users";
const USERS_BY_EMAIL: &str = "users_by_email";
const PLACES: &str = "places";
const PLACES_BY_NAME: &str = "places_by_name";
const BOOKINGS: &str = "bookings";
const BOOKINGS_BY_PLACE: &str = "bookings_by_place";

/// Store backed by sled: one tree per entity plus one tree per secondary index.
///
/// Unique indexes are claimed with compare-and-swap, so two concurrent
/// registrations of the same email cannot both succeed.
pub struct SledStore {
    db: sled::Db,
    users: sled::Tree,
    users_by_email: sled::Tree,
    places: sled::Tree,
    places_by_name: sled::Tree,
    bookings: sled::Tree,
    bookings_by_place: sled::Tree,
}

impl SledStore {
    /// Open or create a store under the given directory.
    ///
    /// # Errors
    ///
    /// Returns error if database cannot be opened.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        std::fs::create_dir_all(path).map_err(|e| StoreError::Backend(e.into()))?;
        let db = sled::open(path.join("placebook.db"))?;
        Self::with_db(db)
    }

    /// Open a throwaway in-memory store, removed on drop.
    ///
    /// # Errors
    ///
    /// Returns error if sled cannot create the temporary database.
    pub fn temporary() -> Result<Self, StoreError> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::with_db(db)
    }

    /// Create a store with an existing sled database.
    ///
    /// # Errors
    ///
    /// Returns error if trees cannot be opened.
    pub fn with_db(db: sled::Db) -> Result<Self, StoreError> {
        Ok(Self {
            users: db.open_tree(USERS)?,
            users_by_email: db.open_tree(USERS_BY_EMAIL)?,
            places: db.open_tree(PLACES)?,
            places_by_name: db.open_tree(PLACES_BY_NAME)?,
            bookings: db.open_tree(BOOKINGS)?,
            bookings_by_place: db.open_tree(BOOKINGS_BY_PLACE)?,
            db,
        })
    }

    /// Flush all pending writes to disk.
    ///
    /// # Errors
    ///
    /// Returns error if the flush fails.
    pub fn flush(&self) -> Result<(), StoreError> {
        self.db.flush()?;
        Ok(())
    }

    fn next_id(&self) -> Result<u64, StoreError> {
        // sled ids start at 0; public ids start at 1
        Ok(self.db.generate_id()? + 1)
    }

    /// Claim a unique index key. `Ok(false)` means someone else holds it.
    fn claim(tree: &sled::Tree, key: &[u8], id: u64) -> Result<bool, StoreError> {
        let swapped =
            tree.compare_and_swap(key, None as Option<&[u8]>, Some(&id.to_be_bytes()[..]))?;
        Ok(swapped.is_ok())
    }

    /// Drop an index entry claimed by a write that did not complete.
    fn release(tree: &sled::Tree, key: &[u8]) {
        if let Err(e) = tree.remove(key) {
            tracing::warn!(error = %e, "Failed to release unique index entry");
        }
    }

    fn put<T: Serialize>(tree: &sled::Tree, key: [u8; 8], value: &T) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(value)?;
        tree.insert(key, bytes)?;
        tree.flush()?;
        Ok(())
    }

    fn fetch<T: DeserializeOwned>(
        tree: &sled::Tree,
        key: [u8; 8],
    ) -> Result<Option<T>, StoreError> {
        match tree.get(key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn scan_all<T: DeserializeOwned>(tree: &sled::Tree) -> Result<Vec<T>, StoreError> {
        tree.iter()
            .values()
            .map(|value| Ok(serde_json::from_slice(&value?)?))
            .collect()
    }
}

impl Persistence for SledStore {
    fn create_user(&self, user: NewUser) -> Result<User, StoreError> {
        let id = self.next_id()?;

        if !Self::claim(&self.users_by_email, user.email.as_bytes(), id)? {
            return Err(StoreError::Conflict {
                entity: "user",
                field: "email",
                value: user.email,
            });
        }

        let user = User {
            id: UserId(id),
            email: user.email,
            password_hash: user.password_hash,
            role: user.role,
            created_at: Utc::now(),
        };

        if let Err(e) = Self::put(&self.users, user.id.to_key(), &user) {
            Self::release(&self.users_by_email, user.email.as_bytes());
            return Err(e);
        }

        tracing::debug!(user_id = %user.id, "User stored");
        Ok(user)
    }

    fn get_user(&self, id: UserId) -> Result<Option<User>, StoreError> {
        Self::fetch(&self.users, id.to_key())
    }

    fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        match self.users_by_email.get(email.as_bytes())? {
            Some(id) => {
                let id = u64::from_be_bytes(id.as_ref().try_into().map_err(|_| {
                    StoreError::Backend(sled::Error::ReportableBug(
                        "corrupt email index entry".to_string(),
                    ))
                })?);
                self.get_user(UserId(id))
            }
            None => Ok(None),
        }
    }

    fn update_user(&self, user: &User) -> Result<(), StoreError> {
        if !self.users.contains_key(user.id.to_key())? {
            return Err(StoreError::NotFound {
                entity: "user",
                id: user.id.0,
            });
        }
        Self::put(&self.users, user.id.to_key(), user)
    }

    fn list_users(&self) -> Result<Vec<User>, StoreError> {
        Self::scan_all(&self.users)
    }

    fn create_place(&self, place: NewPlace) -> Result<Place, StoreError> {
        let id = self.next_id()?;

        if !Self::claim(&self.places_by_name, place.name.as_bytes(), id)? {
            return Err(StoreError::Conflict {
                entity: "place",
                field: "name",
                value: place.name,
            });
        }

        let place = Place {
            id: PlaceId(id),
            name: place.name,
            location: place.location,
            image: place.image,
            created_at: Utc::now(),
        };

        if let Err(e) = Self::put(&self.places, place.id.to_key(), &place) {
            Self::release(&self.places_by_name, place.name.as_bytes());
            return Err(e);
        }

        tracing::debug!(place_id = %place.id, "Place stored");
        Ok(place)
    }

    fn get_place(&self, id: PlaceId) -> Result<Option<Place>, StoreError> {
        Self::fetch(&self.places, id.to_key())
    }

    fn update_place(&self, current: &Place, updated: &Place) -> Result<(), StoreError> {
        let key = updated.id.to_key();
        let stale = || StoreError::Stale {
            entity: "place",
            id: updated.id.0,
        };

        let stored_bytes = self.places.get(key)?.ok_or(StoreError::NotFound {
            entity: "place",
            id: updated.id.0,
        })?;
        let stored: Place = serde_json::from_slice(&stored_bytes)?;
        if stored != *current {
            return Err(stale());
        }

        let bytes = serde_json::to_vec(updated)?;

        let renamed = stored.name != updated.name;
        if renamed && !Self::claim(&self.places_by_name, updated.name.as_bytes(), updated.id.0)? {
            return Err(StoreError::Conflict {
                entity: "place",
                field: "name",
                value: updated.name.clone(),
            });
        }

        let swapped = match self.places.compare_and_swap(key, Some(&stored_bytes), Some(bytes)) {
            Ok(swapped) => swapped,
            Err(e) => {
                if renamed {
                    Self::release(&self.places_by_name, updated.name.as_bytes());
                }
                return Err(e.into());
            }
        };
        if swapped.is_err() {
            if renamed {
                Self::release(&self.places_by_name, updated.name.as_bytes());
            }
            return Err(stale());
        }
        self.places.flush()?;

        if renamed {
            self.places_by_name.remove(stored.name.as_bytes())?;
        }
        Ok(())
    }

    fn list_places(&self) -> Result<Vec<Place>, StoreError> {
        Self::scan_all(&self.places)
    }

    fn create_booking(&self, booking: NewBooking) -> Result<Booking, StoreError> {
        let booking = Booking {
            id: BookingId(self.next_id()?),
            place_id: booking.place_id,
            user_id: booking.user_id,
            slot: booking.slot,
            created_at: Utc::now(),
        };

        let mut index_key = Vec::with_capacity(16);
        index_key.extend_from_slice(&booking.place_id.to_key());
        index_key.extend_from_slice(&booking.id.to_key());

        Self::put(&self.bookings, booking.id.to_key(), &booking)?;
        self.bookings_by_place.insert(index_key, &[] as &[u8])?;
        self.bookings_by_place.flush()?;

        tracing::debug!(
            booking_id = %booking.id,
            place_id = %booking.place_id,
            user_id = %booking.user_id,
            "Booking stored"
        );
        Ok(booking)
    }

    fn list_bookings_for_place(&self, place_id: PlaceId) -> Result<Vec<Booking>, StoreError> {
        let mut bookings = Vec::new();
        for entry in self.bookings_by_place.scan_prefix(place_id.to_key()).keys() {
            let key = entry?;
            let Some(id_bytes) = key.get(8..16) else {
                continue;
            };
            let mut raw = [0u8; 8];
            raw.copy_from_slice(id_bytes);
            if let Some(booking) = Self::fetch(&self.bookings, raw)? {
                bookings.push(booking);
            }
        }
        Ok(bookings)
    }
}

impl std::fmt::Debug for SledStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SledStore")
            .field("users", &self.users.len())
            .field("places", &self.places.len())
            .field("bookings", &self.bookings.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Role, TimeSlot};
    use chrono::{Duration, TimeZone};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            email: email.to_string(),
            password_hash: "$argon2id$v=19$m=19456,t=2,p=1$c2FsdA$aGFzaA".to_string(),
            role: Role::User,
        }
    }

    fn new_place(name: &str) -> NewPlace {
        NewPlace {
            name: name.to_string(),
            location: "Floor 2".to_string(),
            image: None,
        }
    }

    fn slot(hour: u32) -> TimeSlot {
        let start = Utc.with_ymd_and_hms(2025, 6, 1, hour, 0, 0).unwrap();
        TimeSlot::new(start, start + Duration::hours(1)).unwrap()
    }

    #[test]
    fn test_user_roundtrip() {
        let store = SledStore::temporary().unwrap();

        let user = store.create_user(new_user("a@x.com")).unwrap();
        assert!(user.id.0 >= 1);
        assert_eq!(user.role, Role::User);

        assert_eq!(store.get_user(user.id).unwrap(), Some(user.clone()));
        assert_eq!(store.find_user_by_email("a@x.com").unwrap(), Some(user));
        assert_eq!(store.find_user_by_email("b@x.com").unwrap(), None);
    }

    #[test]
    fn test_duplicate_email() {
        let store = SledStore::temporary().unwrap();
        store.create_user(new_user("a@x.com")).unwrap();

        let result = store.create_user(new_user("a@x.com"));
        assert!(matches!(
            result,
            Err(StoreError::Conflict { field: "email", .. })
        ));
        assert_eq!(store.list_users().unwrap().len(), 1);
    }

    #[test]
    fn test_update_user_role() {
        let store = SledStore::temporary().unwrap();
        let mut user = store.create_user(new_user("a@x.com")).unwrap();
        assert_eq!(store.count_admins().unwrap(), 0);

        user.role = Role::Admin;
        store.update_user(&user).unwrap();

        assert_eq!(store.get_user(user.id).unwrap().unwrap().role, Role::Admin);
        assert_eq!(store.count_admins().unwrap(), 1);
    }

    #[test]
    fn test_update_missing_user() {
        let store = SledStore::temporary().unwrap();
        let ghost = User {
            id: UserId(999),
            email: "ghost@x.com".to_string(),
            password_hash: String::new(),
            role: Role::User,
            created_at: Utc::now(),
        };
        assert!(matches!(
            store.update_user(&ghost),
            Err(StoreError::NotFound { entity: "user", id: 999 })
        ));
    }

    #[test]
    fn test_unknown_role_in_storage_is_rejected() {
        let store = SledStore::temporary().unwrap();
        let user = store.create_user(new_user("a@x.com")).unwrap();

        let mut raw = serde_json::to_value(&user).unwrap();
        raw["role"] = serde_json::json!("superuser");
        store
            .users
            .insert(user.id.to_key(), serde_json::to_vec(&raw).unwrap())
            .unwrap();

        assert!(matches!(
            store.get_user(user.id),
            Err(StoreError::Serialization(_))
        ));
    }

    #[test]
    fn test_place_name_unique() {
        let store = SledStore::temporary().unwrap();
        store.create_place(new_place("Hall A")).unwrap();
        assert!(matches!(
            store.create_place(new_place("Hall A")),
            Err(StoreError::Conflict { field: "name", .. })
        ));
    }

    #[test]
    fn test_place_rename_moves_index() {
        let store = SledStore::temporary().unwrap();
        let mut a = store.create_place(new_place("Hall A")).unwrap();
        let b = store.create_place(new_place("Hall B")).unwrap();

        // Renaming onto a taken name fails and leaves the record untouched
        let mut clash = a.clone();
        clash.name = b.name.clone();
        assert!(matches!(
            store.update_place(&a, &clash),
            Err(StoreError::Conflict { .. })
        ));
        assert_eq!(store.get_place(a.id).unwrap().unwrap().name, "Hall A");

        let mut renamed = a.clone();
        renamed.name = "Hall C".to_string();
        store.update_place(&a, &renamed).unwrap();
        a = renamed;

        // Old name is free again
        let reused = store.create_place(new_place("Hall A")).unwrap();
        assert_ne!(reused.id, a.id);
        assert_eq!(store.list_places().unwrap().len(), 3);
    }

    #[test]
    fn test_update_place_keeps_name() {
        let store = SledStore::temporary().unwrap();
        let original = store.create_place(new_place("Hall A")).unwrap();
        let mut place = original.clone();
        place.location = "Floor 5".to_string();
        place.image = Some("1_x.png".to_string());
        store.update_place(&original, &place).unwrap();
        assert_eq!(store.get_place(place.id).unwrap(), Some(place));
    }

    #[test]
    fn test_update_from_stale_read_is_rejected() {
        let store = SledStore::temporary().unwrap();
        let original = store.create_place(new_place("Hall A")).unwrap();

        let mut first = original.clone();
        first.image = Some("1_first.png".to_string());
        let mut second = original.clone();
        second.image = Some("2_second.png".to_string());
        second.name = "Hall B".to_string();

        store.update_place(&original, &first).unwrap();
        assert!(matches!(
            store.update_place(&original, &second),
            Err(StoreError::Stale { entity: "place", .. })
        ));

        // The winner's record stands and the loser's name claim was released
        assert_eq!(store.get_place(original.id).unwrap(), Some(first));
        assert!(store.create_place(new_place("Hall B")).is_ok());
    }

    #[test]
    fn test_update_missing_place() {
        let store = SledStore::temporary().unwrap();
        let place = store.create_place(new_place("Hall A")).unwrap();
        let mut ghost = place.clone();
        ghost.id = PlaceId(999);
        assert!(matches!(
            store.update_place(&ghost, &ghost),
            Err(StoreError::NotFound { entity: "place", id: 999 })
        ));
    }

    #[test]
    fn test_bookings_by_place() {
        let store = SledStore::temporary().unwrap();
        let user = store.create_user(new_user("a@x.com")).unwrap();
        let hall = store.create_place(new_place("Hall A")).unwrap();
        let room = store.create_place(new_place("Room 1")).unwrap();

        for hour in [9, 10] {
            store
                .create_booking(NewBooking {
                    place_id: hall.id,
                    user_id: user.id,
                    slot: slot(hour),
                })
                .unwrap();
        }
        store
            .create_booking(NewBooking {
                place_id: room.id,
                user_id: user.id,
                slot: slot(9),
            })
            .unwrap();

        let hall_bookings = store.list_bookings_for_place(hall.id).unwrap();
        assert_eq!(hall_bookings.len(), 2);
        assert!(hall_bookings.iter().all(|b| b.place_id == hall.id));
        assert!(hall_bookings[0].id < hall_bookings[1].id);

        assert_eq!(store.list_bookings_for_place(room.id).unwrap().len(), 1);
        assert!(store.list_bookings_for_place(PlaceId(12345)).unwrap().is_empty());
    }

    #[test]
    fn test_overlapping_bookings_are_accepted() {
        // No double-booking prevention at the storage layer
        let store = SledStore::temporary().unwrap();
        let user = store.create_user(new_user("a@x.com")).unwrap();
        let hall = store.create_place(new_place("Hall A")).unwrap();

        for _ in 0..2 {
            store
                .create_booking(NewBooking {
                    place_id: hall.id,
                    user_id: user.id,
                    slot: slot(9),
                })
                .unwrap();
        }
        assert_eq!(store.list_bookings_for_place(hall.id).unwrap().len(), 2);
    }

    #[test]
    fn test_reopen_persists() {
        let temp_dir = TempDir::new().unwrap();
        let id = {
            let store = SledStore::open(temp_dir.path()).unwrap();
            let user = store.create_user(new_user("a@x.com")).unwrap();
            store.flush().unwrap();
            user.id
        };

        let store = SledStore::open(temp_dir.path()).unwrap();
        assert_eq!(store.get_user(id).unwrap().unwrap().email, "a@x.com");
    }
}
