//! Profile and avatar commands.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use hexa_core::profile::{ImagePicker, ImageSource, ProfileService};
use hexa_core::screens::ProfileScreen;

use super::require_session;
use crate::cli::App;

/// Picks an image that was already read from disk.
struct FilePicker {
    image: ImageSource,
}

impl FilePicker {
    fn open(path: &Path) -> Result<Self> {
        let bytes = fs::read(path).with_context(|| format!("read {}", path.display()))?;
        Ok(Self {
            image: ImageSource {
                name: path.to_string_lossy().into_owned(),
                bytes,
            },
        })
    }
}

impl ImagePicker for FilePicker {
    async fn request_permission(&self) -> bool {
        true
    }

    async fn pick(&self) -> Result<Option<ImageSource>> {
        Ok(Some(self.image.clone()))
    }
}

async fn load(app: &App) -> Result<ProfileScreen> {
    require_session(app).await?;
    let screen = ProfileScreen::new(app.ctx());
    if screen.refresh().await.is_none() {
        bail!("Could not load profile");
    }
    Ok(screen)
}

pub async fn show(app: &App) -> Result<()> {
    let screen = load(app).await?;
    let profile = screen.profile();
    let out = serde_json::json!({
        "username": profile.username,
        "full_name": profile.full_name,
        "avatar_url": profile.avatar_url,
        "avatar_loaded": screen.avatar_data_url().is_some(),
    });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

pub async fn update(
    app: &App,
    username: Option<String>,
    full_name: Option<String>,
) -> Result<()> {
    if username.is_none() && full_name.is_none() {
        bail!("Nothing to update: pass --username or --full-name");
    }
    let screen = load(app).await?;
    if let Some(username) = username {
        screen.set_username(username);
    }
    if let Some(full_name) = full_name {
        screen.set_full_name(full_name);
    }
    if !screen.save().await {
        bail!("Profile not saved");
    }
    Ok(())
}

pub async fn avatar(app: &App, file: &Path) -> Result<()> {
    let picker = FilePicker::open(file)?;
    let screen = load(app).await?;
    let Some(path) = screen.pick_avatar(&picker).await else {
        bail!("Avatar not uploaded");
    };
    if !screen.save().await {
        bail!("Avatar uploaded to {path} but the profile was not saved");
    }
    println!("Avatar set to {path}");
    Ok(())
}

pub async fn download_avatar(app: &App, out: &Path) -> Result<()> {
    require_session(app).await?;
    let service = ProfileService::from_config(app.client().clone(), &app.ctx().config);
    let profile = service.fetch().await?.unwrap_or_default();
    let Some(path) = profile.avatar_path() else {
        bail!("No avatar set");
    };
    let blob = service.download_avatar_bytes(path).await?;
    fs::write(out, &blob.bytes).with_context(|| format!("write {}", out.display()))?;
    println!("Saved {} bytes to {}", blob.bytes.len(), out.display());
    Ok(())
}
