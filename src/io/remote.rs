// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Remote save endpoint.
//!
//! The editor can commit through a server that composites the annotation
//! and answers with the name of a rendered preview image. The request runs
//! on a background thread, and the preview is fetched there as well, so the
//! editor only sees the finished outcome.

use super::media::{ImageSource, LoadedImage};
use crate::models::annotation::PixelPoint;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::sync::mpsc::{channel, Receiver};
use std::sync::Arc;

/// Body of `POST <save-endpoint>`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SaveRequest {
    pub image: String,
    pub points: Vec<PixelPoint>,
    pub mask_data: String,
}

/// Answer of the save endpoint.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SaveResponse {
    pub status: String,
    #[serde(default)]
    pub preview_name: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl SaveResponse {
    pub fn is_success(&self) -> bool {
        self.status == "success"
    }
}

/// Something that persists an editor session remotely.
pub trait SaveEndpoint: Send + Sync {
    fn save(&self, request: &SaveRequest) -> Result<SaveResponse>;
}

/// JSON-over-HTTP save endpoint.
#[derive(Debug, Clone)]
pub struct HttpSaveEndpoint {
    url: String,
}

impl HttpSaveEndpoint {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

impl SaveEndpoint for HttpSaveEndpoint {
    fn save(&self, request: &SaveRequest) -> Result<SaveResponse> {
        match ureq::post(&self.url).send_json(request) {
            Ok(response) => response
                .into_json::<SaveResponse>()
                .context("Save endpoint returned an unreadable response"),
            Err(ureq::Error::Status(code, response)) => match response.into_json::<SaveResponse>() {
                Ok(body) => Ok(body),
                Err(_) => bail!("Save endpoint returned HTTP {}", code),
            },
            Err(e) => Err(e).context("Failed to reach save endpoint"),
        }
    }
}

/// Final result of a remote save.
#[derive(Debug)]
pub enum RemoteSaveOutcome {
    /// The server stored the annotation; `preview` is the loaded preview
    /// image when the server named one and it could be fetched.
    Saved { preview: Option<Arc<LoadedImage>> },
    /// The server answered with a non-success status.
    Rejected(String),
}

/// A remote save running in the background.
pub struct RemoteSaveJob {
    receiver: Receiver<Result<RemoteSaveOutcome, String>>,
}

impl RemoteSaveJob {
    pub fn spawn(
        endpoint: Arc<dyn SaveEndpoint>,
        source: Arc<dyn ImageSource>,
        request: SaveRequest,
    ) -> Self {
        let (sender, receiver) = channel();

        std::thread::spawn(move || {
            let result = (|| -> Result<RemoteSaveOutcome, String> {
                let response = endpoint
                    .save(&request)
                    .map_err(|e| format!("{:#}", e))?;

                if !response.is_success() {
                    let reason = response
                        .message
                        .unwrap_or_else(|| format!("status {}", response.status));
                    return Ok(RemoteSaveOutcome::Rejected(reason));
                }

                let preview = match response.preview_name {
                    Some(name) => match source.fetch(&name) {
                        Ok(image) => Some(Arc::new(image)),
                        Err(e) => {
                            log::error!("Failed to load preview {}: {:#}", name, e);
                            None
                        }
                    },
                    None => None,
                };
                Ok(RemoteSaveOutcome::Saved { preview })
            })();

            let _ = sender.send(result);
        });

        Self { receiver }
    }

    /// The outcome, once the background work has finished.
    pub fn poll(&self) -> Option<Result<RemoteSaveOutcome, String>> {
        self.receiver.try_recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::media::DirImageSource;
    use std::time::{Duration, Instant};

    struct FixedEndpoint(SaveResponse);

    impl SaveEndpoint for FixedEndpoint {
        fn save(&self, _request: &SaveRequest) -> Result<SaveResponse> {
            Ok(self.0.clone())
        }
    }

    fn request() -> SaveRequest {
        SaveRequest {
            image: "cat.png".to_string(),
            points: vec![PixelPoint {
                x: 400,
                y: 300,
                color: None,
            }],
            mask_data: String::new(),
        }
    }

    fn wait(job: &RemoteSaveJob) -> Result<RemoteSaveOutcome, String> {
        let deadline = Instant::now() + Duration::from_secs(10);
        loop {
            if let Some(result) = job.poll() {
                return result;
            }
            assert!(Instant::now() < deadline, "remote save never finished");
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn test_request_body_shape() {
        let json = serde_json::to_string(&request()).unwrap();
        assert_eq!(json, r#"{"image":"cat.png","points":[{"x":400,"y":300}],"mask_data":""}"#);
    }

    #[test]
    fn test_response_parsing() {
        let ok: SaveResponse =
            serde_json::from_str(r#"{"status":"success","preview_name":"p.jpg"}"#).unwrap();
        assert!(ok.is_success());
        assert_eq!(ok.preview_name.as_deref(), Some("p.jpg"));

        let err: SaveResponse = serde_json::from_str(r#"{"status":"error","message":"boom"}"#).unwrap();
        assert!(!err.is_success());
    }

    #[test]
    fn test_success_fetches_preview() {
        let dir = tempfile::tempdir().unwrap();
        image::RgbaImage::new(8, 6).save(dir.path().join("p.png")).unwrap();
        let endpoint = FixedEndpoint(SaveResponse {
            status: "success".to_string(),
            preview_name: Some("p.png".to_string()),
            message: None,
        });

        let job = RemoteSaveJob::spawn(
            Arc::new(endpoint),
            Arc::new(DirImageSource::new(dir.path())),
            request(),
        );

        match wait(&job) {
            Ok(RemoteSaveOutcome::Saved { preview: Some(image) }) => {
                assert_eq!(image.name, "p.png");
                assert_eq!(image.dimensions(), (8, 6));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_non_success_status_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let endpoint = FixedEndpoint(SaveResponse {
            status: "error".to_string(),
            preview_name: None,
            message: Some("Image not found".to_string()),
        });

        let job = RemoteSaveJob::spawn(
            Arc::new(endpoint),
            Arc::new(DirImageSource::new(dir.path())),
            request(),
        );

        match wait(&job) {
            Ok(RemoteSaveOutcome::Rejected(reason)) => assert_eq!(reason, "Image not found"),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }
}
