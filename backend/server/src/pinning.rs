//! # Pinning
//!
//! Content-addressed storage for artwork images and their NFT metadata.
//!
//!
//!
//! ## Remote
//! - Pinata compatible API, `pinFileToIPFS` for images and `pinJSONToIPFS` for metadata
//! - Bearer JWT from `PINATA_API_KEY` (env or `/run/secrets`)
//! - No retries, a single 30 second timeout per request
//!
//!
//!
//! ## Local Fallback
//! Used when no JWT is configured or the remote call fails, so an upload never fails just
//! because the pinning service is down.
//!
//! - Hash is a CIDv0: base58btc of the sha2-256 multihash (`0x12 0x20 ++ digest`), always `Qm` + 44 chars
//! - Same bytes, same hash, so re-uploads overwrite themselves
//! - Bytes go to `<upload_dir>/<hash>`, the content type to `<upload_dir>/<hash>.json`
//! - Only raster images and JSON keep their content type, everything else is stored as
//!   `application/octet-stream`
//! - Served back through `GET /api/images/{hash}`
//!
//! Local hashes are real CIDv0 values, but nothing announces them to IPFS. They only resolve
//! through this server.
use std::{path::PathBuf, sync::LazyLock, time::Duration};

use regex::Regex;
use reqwest::{
    Client, StatusCode,
    multipart::{Form, Part},
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::fs;
use tracing::{info, warn};

use crate::config::Config;

const SHA2_256_MULTIHASH: [u8; 2] = [0x12, 0x20];
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const OCTET_STREAM: &str = "application/octet-stream";

static CID_V0: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^Qm[1-9A-HJ-NP-Za-km-z]{44}$").unwrap());

#[derive(Error, Debug)]
pub enum PinError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("pinning service answered {0}: {1}")]
    Status(StatusCode, String),

    #[error("local store: {0}")]
    Io(#[from] std::io::Error),

    #[error("metadata encoding: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PinSource {
    Remote,
    Local,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pinned {
    pub hash: String,
    pub source: PinSource,
}

impl Pinned {
    pub fn uri(&self) -> String {
        format!("ipfs://{}", self.hash)
    }
}

pub struct Upload<'a> {
    pub file_name: &'a str,
    pub content_type: &'a str,
    pub bytes: &'a [u8],
    /// Human readable label stored as pin metadata.
    pub label: &'a str,
}

#[derive(Deserialize)]
struct PinResponse {
    #[serde(rename = "IpfsHash")]
    ipfs_hash: String,
}

pub struct PinataClient {
    http: Client,
    base_url: String,
    jwt: String,
}

impl PinataClient {
    pub fn new(base_url: &str, jwt: &str) -> Result<Self, PinError> {
        let http = Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            jwt: jwt.to_string(),
        })
    }

    pub async fn pin_file(&self, upload: &Upload<'_>) -> Result<String, PinError> {
        let part = Part::bytes(upload.bytes.to_vec())
            .file_name(upload.file_name.to_string())
            .mime_str(upload.content_type)?;

        let form = Form::new().part("file", part).text(
            "pinataMetadata",
            json!({ "name": format!("{} - Decentralized Museum", upload.label) }).to_string(),
        );

        let request = self
            .http
            .post(format!("{}/pinning/pinFileToIPFS", self.base_url))
            .bearer_auth(&self.jwt)
            .multipart(form);

        Self::send(request).await
    }

    pub async fn pin_json(&self, value: &Value) -> Result<String, PinError> {
        let request = self
            .http
            .post(format!("{}/pinning/pinJSONToIPFS", self.base_url))
            .bearer_auth(&self.jwt)
            .json(value);

        Self::send(request).await
    }

    async fn send(request: reqwest::RequestBuilder) -> Result<String, PinError> {
        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PinError::Status(status, body));
        }

        Ok(response.json::<PinResponse>().await?.ipfs_hash)
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Sidecar {
    content_type: String,
}

pub struct StoredContent {
    pub content_type: String,
    pub bytes: Vec<u8>,
}

pub struct LocalStore {
    dir: PathBuf,
}

impl LocalStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub async fn save(&self, content_type: &str, bytes: &[u8]) -> Result<String, PinError> {
        let hash = cid_v0(bytes);

        fs::create_dir_all(&self.dir).await?;
        fs::write(self.dir.join(&hash), bytes).await?;

        let sidecar = serde_json::to_vec(&Sidecar {
            content_type: stored_content_type(content_type),
        })?;
        fs::write(self.dir.join(format!("{hash}.json")), sidecar).await?;

        Ok(hash)
    }

    /// Unknown or malformed hashes are `None`, never a path outside the store.
    pub async fn load(&self, hash: &str) -> Option<StoredContent> {
        if !is_cid_v0(hash) {
            return None;
        }

        let bytes = fs::read(self.dir.join(hash)).await.ok()?;
        let content_type = fs::read(self.dir.join(format!("{hash}.json")))
            .await
            .ok()
            .and_then(|raw| serde_json::from_slice::<Sidecar>(&raw).ok())
            .map(|sidecar| sidecar.content_type)
            .unwrap_or_else(|| OCTET_STREAM.to_string());

        Some(StoredContent {
            content_type,
            bytes,
        })
    }
}

pub struct PinningService {
    remote: Option<PinataClient>,
    local: LocalStore,
}

impl PinningService {
    pub fn new(remote: Option<PinataClient>, local: LocalStore) -> Self {
        Self { remote, local }
    }

    pub fn from_config(config: &Config) -> Result<Self, PinError> {
        let remote = match &config.pinata_jwt {
            Some(jwt) => Some(PinataClient::new(&config.pinata_api_url, jwt)?),
            None => {
                info!(
                    "No pinning credentials, storing uploads in {}",
                    config.upload_dir.display()
                );
                None
            }
        };

        Ok(Self::new(remote, LocalStore::new(&config.upload_dir)))
    }

    pub fn local(&self) -> &LocalStore {
        &self.local
    }

    pub async fn pin_file(&self, upload: &Upload<'_>) -> Result<Pinned, PinError> {
        if let Some(remote) = &self.remote {
            match remote.pin_file(upload).await {
                Ok(hash) => {
                    return Ok(Pinned {
                        hash,
                        source: PinSource::Remote,
                    });
                }
                Err(e) => warn!("Pinning {} failed, using local storage: {e}", upload.file_name),
            }
        }

        let hash = self.local.save(upload.content_type, upload.bytes).await?;

        Ok(Pinned {
            hash,
            source: PinSource::Local,
        })
    }

    pub async fn pin_json(&self, value: &Value) -> Result<Pinned, PinError> {
        if let Some(remote) = &self.remote {
            match remote.pin_json(value).await {
                Ok(hash) => {
                    return Ok(Pinned {
                        hash,
                        source: PinSource::Remote,
                    });
                }
                Err(e) => warn!("Pinning metadata failed, using local storage: {e}"),
            }
        }

        let bytes = serde_json::to_vec(value)?;
        let hash = self.local.save("application/json", &bytes).await?;

        Ok(Pinned {
            hash,
            source: PinSource::Local,
        })
    }
}

pub fn cid_v0(bytes: &[u8]) -> String {
    let mut multihash = SHA2_256_MULTIHASH.to_vec();
    multihash.extend_from_slice(&Sha256::digest(bytes));

    bs58::encode(multihash).into_string()
}

pub fn is_cid_v0(hash: &str) -> bool {
    CID_V0.is_match(hash)
}

/// Client supplied types are served back from the API origin, so markup and SVG never keep theirs.
fn stored_content_type(content_type: &str) -> String {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    let servable = essence == "application/json"
        || (essence.starts_with("image/") && essence != "image/svg+xml");

    if servable {
        essence
    } else {
        OCTET_STREAM.to_string()
    }
}
