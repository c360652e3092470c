//! Place catalogue.

use std::sync::Arc;

use axum::{
    Json,
    body::Bytes,
    extract::{Multipart, Path, State, multipart::MultipartRejection},
};
use placebook_core::validation::{limits::MAX_TEXT_LENGTH, require, sanitize_text};
use placebook_core::{NewPlace, Place, PlaceId};

use super::{ApiResult, parse_id};
use crate::blob::{BlobStore, is_image_content_type};
use crate::error::ApiError;
use crate::server::GatewayState;

/// An uploaded file held in memory until the record is validated.
#[derive(Debug)]
struct Upload {
    filename: String,
    bytes: Bytes,
}

/// Fields of a place multipart form. Every field is optional at parse time.
#[derive(Debug, Default)]
struct PlaceForm {
    name: Option<String>,
    location: Option<String>,
    image: Option<Upload>,
}

impl PlaceForm {
    async fn read(mut multipart: Multipart) -> ApiResult<Self> {
        let mut form = Self::default();

        while let Some(field) = multipart.next_field().await? {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };

            match name.as_str() {
                "name" => form.name = Some(field.text().await?),
                "location" => form.location = Some(field.text().await?),
                "image" => {
                    let filename = field.file_name().unwrap_or_default().to_string();
                    let content_type = field.content_type().map(str::to_string);
                    let bytes = field.bytes().await?;

                    // An empty file input means "no image"
                    if filename.is_empty() && bytes.is_empty() {
                        continue;
                    }
                    if !is_image_content_type(content_type.as_deref()) {
                        return Err(ApiError::Validation(
                            "image must be an image file".to_string(),
                        ));
                    }
                    form.image = Some(Upload { filename, bytes });
                }
                other => tracing::debug!(field = %other, "Ignoring unknown form field"),
            }
        }

        Ok(form)
    }
}

/// Sanitize an optional text field, treating blank input as absent.
fn optional_text(field: &str, value: Option<String>) -> ApiResult<Option<String>> {
    value
        .filter(|v| !v.trim().is_empty())
        .map(|v| sanitize_text(field, &v, MAX_TEXT_LENGTH))
        .transpose()
        .map_err(Into::into)
}

/// Delete a blob, logging instead of failing.
async fn discard_blob(blobs: &dyn BlobStore, filename: &str) {
    if let Err(e) = blobs.delete(filename).await {
        tracing::warn!(filename = %filename, error = %e, "Failed to delete image");
    }
}

fn place_not_found() -> ApiError {
    ApiError::NotFound("Place not found".to_string())
}

/// `GET /places`
pub(crate) async fn list_places(
    State(state): State<Arc<GatewayState>>,
) -> ApiResult<Json<Vec<Place>>> {
    Ok(Json(state.store.list_places()?))
}

/// `GET /places/{id}`
pub(crate) async fn get_place(
    State(state): State<Arc<GatewayState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Place>> {
    let id: PlaceId = parse_id(&id)?;
    let place = state.store.get_place(id)?.ok_or_else(place_not_found)?;
    Ok(Json(place))
}

/// `POST /places`
pub(crate) async fn create_place(
    State(state): State<Arc<GatewayState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Json<Place>> {
    let form = PlaceForm::read(multipart?).await?;

    let name = sanitize_text("name", &require("name", form.name)?, MAX_TEXT_LENGTH)?;
    let location = sanitize_text(
        "location",
        &require("location", form.location)?,
        MAX_TEXT_LENGTH,
    )?;

    let image = match form.image {
        Some(upload) => Some(state.blobs.save(&upload.filename, &upload.bytes).await?),
        None => None,
    };

    let created = state.store.create_place(NewPlace {
        name,
        location,
        image: image.clone(),
    });

    match created {
        Ok(place) => {
            tracing::info!(place_id = %place.id, name = %place.name, "Place created");
            Ok(Json(place))
        }
        Err(e) => {
            if let Some(filename) = image {
                discard_blob(state.blobs.as_ref(), &filename).await;
            }
            Err(e.into())
        }
    }
}

/// `PUT /places/{id}`
///
/// Only supplied, non-blank fields change. A new image replaces the old one,
/// which is removed once the record points at the new file. A concurrent
/// update of the same place makes the later writer fail with 409.
pub(crate) async fn update_place(
    State(state): State<Arc<GatewayState>>,
    Path(id): Path<String>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Json<Place>> {
    let id: PlaceId = parse_id(&id)?;
    let form = PlaceForm::read(multipart?).await?;

    let name = optional_text("name", form.name)?;
    let location = optional_text("location", form.location)?;

    let current = state.store.get_place(id)?.ok_or_else(place_not_found)?;
    let mut place = current.clone();
    if let Some(name) = name {
        place.name = name;
    }
    if let Some(location) = location {
        place.location = location;
    }

    let new_image = match form.image {
        Some(upload) => Some(state.blobs.save(&upload.filename, &upload.bytes).await?),
        None => None,
    };
    let old_image = match &new_image {
        Some(filename) => place.image.replace(filename.clone()),
        None => None,
    };

    if let Err(e) = state.store.update_place(&current, &place) {
        if let Some(filename) = new_image {
            discard_blob(state.blobs.as_ref(), &filename).await;
        }
        return Err(e.into());
    }

    if let Some(filename) = old_image {
        discard_blob(state.blobs.as_ref(), &filename).await;
    }

    tracing::info!(place_id = %place.id, "Place updated");
    Ok(Json(place))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_optional_text_skips_blank() {
        assert_eq!(optional_text("name", None).unwrap(), None);
        assert_eq!(optional_text("name", Some("   ".to_string())).unwrap(), None);
        assert_eq!(
            optional_text("name", Some("  Hall A ".to_string())).unwrap(),
            Some("Hall A".to_string())
        );
        assert!(optional_text("name", Some("x".repeat(201))).is_err());
    }
}
