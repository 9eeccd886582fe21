//! # Artwork Uploads
//!
//! Multipart upload of an artwork image, pinned together with its NFT metadata.
//!
//! ## Flow
//! 1. Read the `file` part plus the text fields `title`, `description`, `artistAddress`,
//!    `price` and `royaltyPercentage`
//! 2. Pin the image, label `<title> - Decentralized Museum`
//! 3. Build the metadata JSON pointing at `ipfs://<image hash>` and pin it
//! 4. Store the artwork with a fresh token id. Minting happens later, client side
//!
//! Pinning never fails the request on its own, see [`crate::pinning`].
use std::sync::Arc;

use axum::{
    Json,
    extract::{
        Multipart, Path, State,
        multipart::{MultipartError, MultipartRejection},
    },
    http::header::{CONTENT_TYPE, X_CONTENT_TYPE_OPTIONS},
    response::IntoResponse,
};
use serde_json::{Value, json};
use tracing::info;

use crate::{
    error::AppError,
    models::{DEFAULT_ROYALTY, NewArtwork},
    pinning::Upload,
    state::AppState,
    utils::{require, token_id},
};

#[derive(Default)]
struct UploadForm {
    file: Option<FilePart>,
    title: Option<String>,
    description: Option<String>,
    artist_address: Option<String>,
    price: Option<String>,
    royalty_percentage: Option<String>,
}

struct FilePart {
    file_name: String,
    content_type: String,
    bytes: Vec<u8>,
}

fn malformed(e: MultipartError) -> AppError {
    AppError::Validation(e.body_text())
}

async fn read_form(mut multipart: Multipart) -> Result<UploadForm, AppError> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart.next_field().await.map_err(malformed)? {
        let name = field.name().unwrap_or_default().to_string();

        if name == "file" {
            let file_name = field.file_name().unwrap_or("artwork").to_string();
            let content_type = field
                .content_type()
                .unwrap_or("application/octet-stream")
                .to_string();
            let bytes = field.bytes().await.map_err(malformed)?.to_vec();

            form.file = Some(FilePart {
                file_name,
                content_type,
                bytes,
            });
            continue;
        }

        let value = field.text().await.map_err(malformed)?;
        let value = Some(value).filter(|v| !v.is_empty());

        match name.as_str() {
            "title" => form.title = value,
            "description" => form.description = value,
            "artistAddress" => form.artist_address = value,
            "price" => form.price = value,
            "royaltyPercentage" => form.royalty_percentage = value,
            _ => {}
        }
    }

    Ok(form)
}

pub fn metadata(
    title: &str,
    description: &str,
    image_hash: &str,
    artist_address: &str,
    price: Option<&str>,
    royalty_percentage: &str,
) -> Value {
    json!({
        "name": title,
        "description": description,
        "image": format!("ipfs://{image_hash}"),
        "attributes": [
            { "trait_type": "Artist", "value": artist_address },
            { "trait_type": "Price", "value": price.unwrap_or("Not for sale") },
            { "trait_type": "Royalty", "value": format!("{royalty_percentage}%") },
        ],
    })
}

pub async fn upload_handler(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<impl IntoResponse, AppError> {
    let form = read_form(multipart?).await?;

    let file = form
        .file
        .ok_or_else(|| AppError::Validation("No file uploaded".to_string()))?;
    let title = require(form.title, "title")?;
    let description = require(form.description, "description")?;
    let artist_address = require(form.artist_address, "artistAddress")?;
    let royalty_percentage = form
        .royalty_percentage
        .unwrap_or_else(|| DEFAULT_ROYALTY.to_string());

    let image = state
        .pinning
        .pin_file(&Upload {
            file_name: &file.file_name,
            content_type: &file.content_type,
            bytes: &file.bytes,
            label: &title,
        })
        .await?;

    let metadata = metadata(
        &title,
        &description,
        &image.hash,
        &artist_address,
        form.price.as_deref(),
        &royalty_percentage,
    );
    let metadata_uri = state.pinning.pin_json(&metadata).await?.uri();

    let artwork = state
        .store
        .create_artwork(NewArtwork {
            token_id: token_id(),
            title,
            description,
            artist_address,
            ipfs_hash: image.hash.clone(),
            metadata_uri: metadata_uri.clone(),
            price: form.price,
            royalty_percentage: Some(royalty_percentage),
            ..Default::default()
        })
        .await;

    info!(
        "Artwork {} by {} pinned {:?} as {}",
        artwork.token_id, artwork.artist_address, image.source, image.hash
    );

    Ok(Json(json!({
        "success": true,
        "artwork": artwork,
        "ipfsHash": image.hash,
        "metadataUri": metadata_uri,
        "pinnedTo": image.source,
        "message": "Artwork uploaded to IPFS successfully. Ready to mint NFT!",
    })))
}

pub async fn image_handler(
    State(state): State<Arc<AppState>>,
    Path(hash): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let content = state
        .pinning
        .local()
        .load(&hash)
        .await
        .ok_or_else(|| AppError::NotFound("Image not found".to_string()))?;

    Ok((
        [
            (CONTENT_TYPE, content.content_type),
            (X_CONTENT_TYPE_OPTIONS, "nosniff".to_string()),
        ],
        content.bytes,
    ))
}
