//! Object storage upload and download.

use bytes::Bytes;
use reqwest::header::CONTENT_TYPE;

use super::{BackendClient, BackendError, BackendResult};

/// Options for [`BackendClient::upload`].
#[derive(Debug, Clone)]
pub struct UploadOptions {
    pub content_type: String,
    /// Overwrite an existing object at the same path
    pub upsert: bool,
}

/// Downloaded object.
#[derive(Debug, Clone)]
pub struct Blob {
    pub bytes: Bytes,
    pub content_type: Option<String>,
}

fn object_segments<'a>(bucket: &'a str, path: &'a str) -> BackendResult<Vec<&'a str>> {
    let parts: Vec<&str> = path.split('/').filter(|part| !part.is_empty()).collect();
    if bucket.is_empty() || parts.is_empty() {
        return Err(BackendError::parse(
            "Invalid object path",
            format!("{bucket}/{path}"),
        ));
    }
    let mut segments = vec!["storage", "v1", "object", bucket];
    segments.extend(parts);
    Ok(segments)
}

impl BackendClient {
    /// Uploads bytes to `bucket/path`.
    pub async fn upload(
        &self,
        bucket: &str,
        path: &str,
        data: Vec<u8>,
        options: &UploadOptions,
    ) -> BackendResult<()> {
        let url = self.endpoint(&object_segments(bucket, path)?)?;
        let session = self
            .get_session()
            .await?
            .ok_or_else(BackendError::not_authenticated)?;

        let size = data.len();
        let builder = self
            .inner
            .http
            .post(url)
            .header(CONTENT_TYPE, &options.content_type)
            .header("x-upsert", if options.upsert { "true" } else { "false" })
            .body(data);
        self.send(self.authorize(builder, &session.access_token)).await?;
        tracing::debug!(bucket, path, size, "object uploaded");
        Ok(())
    }

    /// Downloads the object at `bucket/path`.
    pub async fn download(&self, bucket: &str, path: &str) -> BackendResult<Blob> {
        let url = self.endpoint(&object_segments(bucket, path)?)?;
        let bearer = self.data_bearer().await?;

        let builder = self.inner.http.get(url);
        let response = self.send(self.authorize(builder, &bearer)).await?;
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let bytes = response
            .bytes()
            .await
            .map_err(|err| BackendError::network(&err))?;
        Ok(Blob {
            bytes,
            content_type,
        })
    }
}
