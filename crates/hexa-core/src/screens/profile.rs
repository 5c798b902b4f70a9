//! Profile editing screen.

use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;

use crate::action::{InFlight, ReentryPolicy};
use crate::backend::BackendError;
use crate::notice::{Notice, NoticeSink};
use crate::profile::{ImagePicker, Profile, ProfileService};
use crate::screens::ScreenContext;

pub const PHOTO_PERMISSION_DENIED: &str =
    "Sorry, we need permission to access your photo library";

#[derive(Debug, Default)]
struct ProfileView {
    profile: Profile,
    /// Downloaded avatar as a `data:` URL
    avatar: Option<String>,
}

/// Loads, edits and saves the signed-in user's profile.
///
/// `loading` covers profile reads, saves and avatar downloads; `uploading`
/// covers avatar uploads only.
pub struct ProfileScreen {
    service: ProfileService,
    notices: NoticeSink,
    reentry: ReentryPolicy,
    loading: InFlight,
    uploading: InFlight,
    view: Mutex<ProfileView>,
}

impl ProfileScreen {
    pub fn new(ctx: &ScreenContext) -> Self {
        Self {
            service: ProfileService::from_config(ctx.client.clone(), &ctx.config),
            notices: ctx.notices.clone(),
            reentry: ctx.reentry,
            loading: InFlight::new(),
            uploading: InFlight::new(),
            view: Mutex::new(ProfileView::default()),
        }
    }

    fn view(&self) -> MutexGuard<'_, ProfileView> {
        self.view.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn profile(&self) -> Profile {
        self.view().profile.clone()
    }

    pub fn avatar_data_url(&self) -> Option<String> {
        self.view().avatar.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.loading.is_set()
    }

    pub fn is_uploading(&self) -> bool {
        self.uploading.is_set()
    }

    pub fn loading_watch(&self) -> watch::Receiver<bool> {
        self.loading.watch()
    }

    pub fn uploading_watch(&self) -> watch::Receiver<bool> {
        self.uploading.watch()
    }

    pub fn set_username(&self, username: impl Into<String>) {
        self.view().profile.username = Some(username.into());
    }

    pub fn set_full_name(&self, full_name: impl Into<String>) {
        self.view().profile.full_name = Some(full_name.into());
    }

    /// Fetches the profile, then its avatar if one is set.
    pub async fn refresh(&self) -> Option<Profile> {
        let profile = self
            .loading
            .run("load profile", self.reentry, async {
                let fetched = self
                    .service
                    .fetch()
                    .await
                    .inspect_err(|_| self.notices.push(Notice::error("Failed to load profile")))?;
                Ok::<_, BackendError>(fetched.unwrap_or_default())
            })
            .await?;

        let avatar_path = profile.avatar_path().map(str::to_string);
        self.view().profile = profile.clone();
        if let Some(path) = avatar_path {
            self.load_avatar(&path).await;
        }
        Some(profile)
    }

    /// Downloads the avatar. Failures are only logged.
    async fn load_avatar(&self, path: &str) {
        let url = self
            .loading
            .run("download avatar", ReentryPolicy::Concurrent, self.service.download_avatar(path))
            .await;
        if let Some(url) = url {
            self.view().avatar = Some(url);
        }
    }

    /// Saves the edited profile. Returns true on success.
    pub async fn save(&self) -> bool {
        let profile = self.profile();
        self.loading
            .run("update profile", self.reentry, async {
                match self.service.update(&profile).await {
                    Ok(saved) => {
                        if saved {
                            self.notices
                                .push(Notice::success("Profile updated successfully"));
                        }
                        Ok(saved)
                    }
                    Err(err) => {
                        self.notices.push(Notice::error("Failed to update profile"));
                        Err(err)
                    }
                }
            })
            .await
            .unwrap_or(false)
    }

    /// Picks and uploads a new avatar, returning its storage path.
    ///
    /// The new path is kept in the edited profile; it is stored with the
    /// next [`save`](Self::save).
    pub async fn pick_avatar<P: ImagePicker>(&self, picker: &P) -> Option<String> {
        let uploaded = self
            .uploading
            .run("upload avatar", self.reentry, async {
                if !picker.request_permission().await {
                    self.notices.push(Notice::error(PHOTO_PERMISSION_DENIED));
                    return Ok(None);
                }
                let Some(image) = picker.pick().await? else {
                    return Ok(None);
                };
                self.service
                    .upload_avatar(image)
                    .await
                    .map_err(anyhow::Error::from)
            })
            .await;

        let path = match uploaded {
            Some(Some(path)) => path,
            Some(None) => return None,
            None => {
                self.notices.push(Notice::error("Failed to upload image"));
                return None;
            }
        };

        self.view().profile.avatar_url = Some(path.clone());
        self.load_avatar(&path).await;
        Some(path)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use anyhow::Result;

    use crate::profile::{ImagePicker, ImageSource};

    pub struct FakePicker {
        pub granted: bool,
        pub image: Option<ImageSource>,
    }

    impl ImagePicker for FakePicker {
        async fn request_permission(&self) -> bool {
            self.granted
        }

        async fn pick(&self) -> Result<Option<ImageSource>> {
            Ok(self.image.clone())
        }
    }
}
