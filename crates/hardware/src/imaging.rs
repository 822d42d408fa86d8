// SPDX-License-Identifier: Apache-2.0

//! The image-writer seam consumed by deploy steps.
//!
//! Image download, checksum verification and configdrive writing live
//! behind [`ImageWriter`]; the rest of the agent only sees this trait.

use async_trait::async_trait;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

use ira_core::RestError;

/// Maximum configdrive payload accepted for the target partition.
const MAX_CONFIGDRIVE_SIZE: u64 = 64 << 20;

/// What the director sends as `image_info` on a write_image step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageInfo {
    pub id: String,
    pub urls: Vec<String>,
    #[serde(default)]
    pub checksum: Option<String>,
    #[serde(default)]
    pub disk_format: Option<String>,
}

impl ImageInfo {
    /// Shape validation. With deep image inspection enabled a checksum is
    /// mandatory.
    pub fn validate(&self, deep_image_inspection: bool) -> Result<(), RestError> {
        if self.urls.iter().all(|u| u.is_empty()) {
            return Err(RestError::InvalidImage {
                details: format!("image {} has no download urls", self.id),
            });
        }
        if deep_image_inspection && self.checksum.is_none() {
            return Err(RestError::InvalidImage {
                details: format!("image {} has no checksum to verify against", self.id),
            });
        }
        Ok(())
    }
}

#[async_trait]
pub trait ImageWriter: Send + Sync {
    async fn write_image(&self, image: &ImageInfo, device: &str) -> Result<(), RestError>;
    async fn write_configdrive(&self, device: &str, content: &str) -> Result<(), RestError>;
}

/// Streams the image straight onto the target device while hashing it.
pub struct StreamingImageWriter {
    http: reqwest::Client,
    deep_image_inspection: bool,
}

impl StreamingImageWriter {
    pub fn new(
        timeout: std::time::Duration,
        deep_image_inspection: bool,
    ) -> Result<Self, RestError> {
        let http = reqwest::Client::builder()
            .connect_timeout(timeout)
            .build()
            .map_err(|e| RestError::command_execution(format!("http client: {e}")))?;
        Ok(Self { http, deep_image_inspection })
    }

    async fn download_to_device(
        &self,
        image: &ImageInfo,
        url: &str,
        device: &str,
    ) -> Result<(), RestError> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| RestError::ImageDownload {
                image_id: image.id.clone(),
                msg: e.to_string(),
            })?;

        let mut target = tokio::fs::OpenOptions::new()
            .write(true)
            .open(device)
            .await
            .map_err(|e| write_error(device, &e))?;

        let mut hasher = Sha256::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| RestError::ImageDownload {
                image_id: image.id.clone(),
                msg: e.to_string(),
            })?;
            hasher.update(&chunk);
            target.write_all(&chunk).await.map_err(|e| write_error(device, &e))?;
        }
        target.flush().await.map_err(|e| write_error(device, &e))?;

        if let Some(expected) = &image.checksum {
            let actual = hex_digest(hasher);
            if !actual.eq_ignore_ascii_case(expected) {
                return Err(RestError::ImageChecksum { image_id: image.id.clone() });
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ImageWriter for StreamingImageWriter {
    async fn write_image(&self, image: &ImageInfo, device: &str) -> Result<(), RestError> {
        image.validate(self.deep_image_inspection)?;
        let mut last_error = None;
        for url in image.urls.iter().filter(|u| !u.is_empty()) {
            info!(image = %image.id, url, device, "writing image");
            match self.download_to_device(image, url, device).await {
                Ok(()) => return Ok(()),
                Err(err @ RestError::ImageDownload { .. }) => {
                    warn!(image = %image.id, url, %err, "download failed, trying next url");
                    last_error = Some(err);
                }
                Err(err) => return Err(err),
            }
        }
        Err(last_error.unwrap_or_else(|| RestError::ImageDownload {
            image_id: image.id.clone(),
            msg: "no usable download url".into(),
        }))
    }

    async fn write_configdrive(&self, device: &str, content: &str) -> Result<(), RestError> {
        let size = content.len() as u64;
        if size > MAX_CONFIGDRIVE_SIZE {
            return Err(RestError::ConfigDriveTooLarge {
                filename: device.to_string(),
                filesize: size,
            });
        }
        tokio::fs::write(device, content.as_bytes()).await.map_err(|e| {
            RestError::ConfigDriveWrite { device: device.to_string(), details: e.to_string() }
        })
    }
}

fn write_error(device: &str, err: &std::io::Error) -> RestError {
    RestError::ImageWrite {
        device: device.to_string(),
        exit_code: err.raw_os_error().unwrap_or(1),
        stdout: String::new(),
        stderr: err.to_string(),
    }
}

fn hex_digest(hasher: Sha256) -> String {
    hasher.finalize().iter().map(|b| format!("{b:02x}")).collect()
}

/// Records calls instead of touching any device.
#[cfg(any(test, feature = "test-support"))]
pub struct FakeImageWriter {
    pub calls: parking_lot::Mutex<Vec<(String, String)>>,
    pub fail_with: parking_lot::Mutex<Option<RestError>>,
}

#[cfg(any(test, feature = "test-support"))]
impl FakeImageWriter {
    pub fn new() -> Self {
        Self { calls: parking_lot::Mutex::new(Vec::new()), fail_with: parking_lot::Mutex::new(None) }
    }
}

#[cfg(any(test, feature = "test-support"))]
impl Default for FakeImageWriter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(any(test, feature = "test-support"))]
#[async_trait]
impl ImageWriter for FakeImageWriter {
    async fn write_image(&self, image: &ImageInfo, device: &str) -> Result<(), RestError> {
        if let Some(err) = self.fail_with.lock().clone() {
            return Err(err);
        }
        self.calls.lock().push((image.id.clone(), device.to_string()));
        Ok(())
    }

    async fn write_configdrive(&self, device: &str, content: &str) -> Result<(), RestError> {
        self.calls.lock().push(("configdrive".to_string(), format!("{device}:{}", content.len())));
        Ok(())
    }
}

#[cfg(test)]
#[path = "imaging_tests.rs"]
mod imaging_tests;
