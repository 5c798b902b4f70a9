//! Profile rows and avatar images.

use std::future::Future;
use std::path::Path;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::backend::{BackendClient, BackendResult, Blob, UploadOptions, User};
use crate::config::Config;

const PROFILE_COLUMNS: &str = "username,full_name,avatar_url";
const DEFAULT_IMAGE_EXT: &str = "jpeg";

/// Profile row, keyed by user id. Missing columns read as empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
    /// Storage path of the avatar inside the avatar bucket
    #[serde(default)]
    pub avatar_url: Option<String>,
}

impl Profile {
    pub fn username(&self) -> &str {
        self.username.as_deref().unwrap_or_default()
    }

    pub fn full_name(&self) -> &str {
        self.full_name.as_deref().unwrap_or_default()
    }

    pub fn avatar_path(&self) -> Option<&str> {
        self.avatar_url.as_deref().filter(|p| !p.trim().is_empty())
    }
}

#[derive(Serialize)]
struct ProfileRow<'a> {
    id: &'a str,
    username: Option<&'a str>,
    full_name: Option<&'a str>,
    avatar_url: Option<&'a str>,
    updated_at: DateTime<Utc>,
}

/// An image chosen by the user.
#[derive(Debug, Clone)]
pub struct ImageSource {
    /// File name or URI the image came from
    pub name: String,
    pub bytes: Vec<u8>,
}

impl ImageSource {
    /// Lowercased extension of the source name, `jpeg` when there is none.
    pub fn extension(&self) -> String {
        Path::new(&self.name)
            .extension()
            .and_then(|ext| ext.to_str())
            .filter(|ext| !ext.is_empty())
            .map_or_else(|| DEFAULT_IMAGE_EXT.to_string(), str::to_lowercase)
    }

    pub fn content_type(&self) -> String {
        format!("image/{}", self.extension())
    }
}

/// Device image library.
pub trait ImagePicker: Send + Sync {
    /// Asks for library access. `false` means denied.
    fn request_permission(&self) -> impl Future<Output = bool> + Send;

    /// Lets the user pick one image. `None` means the user cancelled.
    fn pick(&self) -> impl Future<Output = anyhow::Result<Option<ImageSource>>> + Send;
}

/// Storage path for a new avatar: `<user_id>-<unix_millis>.<ext>`.
pub fn avatar_object_path(user_id: &str, at: DateTime<Utc>, ext: &str) -> String {
    format!("{user_id}-{}.{ext}", at.timestamp_millis())
}

/// Renders downloaded bytes as a `data:` URL.
pub fn data_url(blob: &Blob) -> String {
    let mime = blob
        .content_type
        .as_deref()
        .filter(|ct| !ct.is_empty())
        .unwrap_or("application/octet-stream");
    format!("data:{mime};base64,{}", STANDARD.encode(&blob.bytes))
}

/// Reads and writes the signed-in user's profile.
#[derive(Clone)]
pub struct ProfileService {
    client: BackendClient,
    table: String,
    bucket: String,
}

impl ProfileService {
    pub fn new(client: BackendClient, table: impl Into<String>, bucket: impl Into<String>) -> Self {
        Self {
            client,
            table: table.into(),
            bucket: bucket.into(),
        }
    }

    pub fn from_config(client: BackendClient, config: &Config) -> Self {
        Self::new(
            client,
            config.tables.profiles.clone(),
            config.storage.avatar_bucket.clone(),
        )
    }

    /// The signed-in user as the backend sees it.
    pub async fn current_user(&self) -> BackendResult<Option<User>> {
        self.client.get_user().await
    }

    /// Fetches the profile. `None` when signed out; a user without a row
    /// gets an empty profile.
    pub async fn fetch(&self) -> BackendResult<Option<Profile>> {
        let Some(user) = self.current_user().await? else {
            return Ok(None);
        };
        let row: Option<Profile> = self
            .client
            .select_single(&self.table, PROFILE_COLUMNS, &[("id", &user.id)])
            .await?;
        Ok(Some(row.unwrap_or_default()))
    }

    /// Upserts the profile. Returns `false` when signed out.
    pub async fn update(&self, profile: &Profile) -> BackendResult<bool> {
        let Some(user) = self.current_user().await? else {
            return Ok(false);
        };
        let row = ProfileRow {
            id: &user.id,
            username: profile.username.as_deref(),
            full_name: profile.full_name.as_deref(),
            avatar_url: profile.avatar_url.as_deref(),
            updated_at: Utc::now(),
        };
        self.client.upsert(&self.table, &row, None).await?;
        tracing::info!(user_id = %user.id, "profile updated");
        Ok(true)
    }

    /// Uploads an avatar image and returns its storage path.
    /// Returns `None` when signed out.
    pub async fn upload_avatar(&self, image: ImageSource) -> BackendResult<Option<String>> {
        let Some(user) = self.current_user().await? else {
            return Ok(None);
        };
        let path = avatar_object_path(&user.id, Utc::now(), &image.extension());
        let options = UploadOptions {
            content_type: image.content_type(),
            upsert: true,
        };
        self.client
            .upload(&self.bucket, &path, image.bytes, &options)
            .await?;
        tracing::info!(%path, "avatar uploaded");
        Ok(Some(path))
    }

    /// Downloads an avatar and returns it as a `data:` URL.
    pub async fn download_avatar(&self, path: &str) -> BackendResult<String> {
        let blob = self.client.download(&self.bucket, path).await?;
        Ok(data_url(&blob))
    }

    /// Downloads an avatar's raw bytes.
    pub async fn download_avatar_bytes(&self, path: &str) -> BackendResult<Blob> {
        self.client.download(&self.bucket, path).await
    }
}
