// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Image loading.
//!
//! Source images are resolved by filename through an [`ImageSource`]: either
//! the image server's `/view` endpoint or a local input directory. Loads run
//! on background threads and report back through a channel that the owner
//! drains from the UI thread.

use anyhow::{bail, Context, Result};
use image::RgbaImage;
use std::io::Read;
use std::path::{Component, Path, PathBuf};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Largest image body accepted from the server.
const MAX_IMAGE_BYTES: u64 = 256 * 1024 * 1024;

/// A decoded source or preview image.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedImage {
    pub name: String,
    pub pixels: RgbaImage,
}

impl LoadedImage {
    pub fn new(name: impl Into<String>, pixels: RgbaImage) -> Self {
        Self {
            name: name.into(),
            pixels,
        }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }
}

/// Resolves image references into rasters.
pub trait ImageSource: Send + Sync {
    /// Fetch and decode the image called `name`.
    fn fetch(&self, name: &str) -> Result<LoadedImage>;

    /// Image references the user can pick from.
    fn list(&self) -> Result<Vec<String>> {
        Ok(Vec::new())
    }
}

/// Decode raw image bytes.
pub fn decode_image(name: &str, bytes: &[u8]) -> Result<LoadedImage> {
    let image = image::load_from_memory(bytes)
        .with_context(|| format!("Failed to decode image {}", name))?;
    Ok(LoadedImage::new(name, image.to_rgba8()))
}

/// Images served by `GET <base>/view?filename=<name>&type=input&t=<ms>`.
#[derive(Debug, Clone)]
pub struct HttpImageSource {
    base_url: String,
}

impl HttpImageSource {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn view_url(&self) -> String {
        format!("{}/view", self.base_url)
    }
}

impl ImageSource for HttpImageSource {
    fn fetch(&self, name: &str) -> Result<LoadedImage> {
        let response = ureq::get(&self.view_url())
            .query("filename", name)
            .query("type", "input")
            .query("t", &cache_buster())
            .call()
            .with_context(|| format!("Failed to fetch image {}", name))?;

        let mut bytes = Vec::new();
        response
            .into_reader()
            .take(MAX_IMAGE_BYTES)
            .read_to_end(&mut bytes)?;
        decode_image(name, &bytes)
    }
}

fn cache_buster() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default()
        .to_string()
}

/// Images stored under a local input directory, referenced by their
/// `/`-separated relative path.
#[derive(Debug, Clone)]
pub struct DirImageSource {
    root: PathBuf,
}

impl DirImageSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, name: &str) -> Result<PathBuf> {
        let relative = Path::new(name);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if name.is_empty() || escapes {
            bail!("Invalid image reference: {}", name);
        }
        Ok(self.root.join(relative))
    }
}

impl ImageSource for DirImageSource {
    fn fetch(&self, name: &str) -> Result<LoadedImage> {
        let path = self.resolve(name)?;
        let image = image::open(&path)
            .with_context(|| format!("Failed to open image {}", path.display()))?;
        Ok(LoadedImage::new(name, image.to_rgba8()))
    }

    fn list(&self) -> Result<Vec<String>> {
        let mut files = Vec::new();
        collect_images(&self.root, &self.root, &mut files)?;
        files.sort();
        Ok(files)
    }
}

fn collect_images(root: &Path, dir: &Path, files: &mut Vec<String>) -> Result<()> {
    if !dir.exists() {
        return Ok(());
    }
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_images(root, &path, files)?;
        } else if image::ImageFormat::from_path(&path).is_ok() {
            if let Ok(relative) = path.strip_prefix(root) {
                let name: Vec<String> = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect();
                files.push(name.join("/"));
            }
        }
    }
    Ok(())
}

/// Outcome of a background load.
#[derive(Debug)]
pub struct LoadResult {
    pub name: String,
    pub image: Result<Arc<LoadedImage>, String>,
}

/// Runs image fetches on background threads.
pub struct ImageLoader {
    source: Arc<dyn ImageSource>,
    sender: Sender<LoadResult>,
    receiver: Receiver<LoadResult>,
}

impl ImageLoader {
    pub fn new(source: Arc<dyn ImageSource>) -> Self {
        let (sender, receiver) = channel();
        Self {
            source,
            sender,
            receiver,
        }
    }

    /// Start loading `name`. The result shows up in [`ImageLoader::drain`].
    pub fn request(&self, name: &str) {
        let source = Arc::clone(&self.source);
        let sender = self.sender.clone();
        let name = name.to_string();

        std::thread::spawn(move || {
            let image = source
                .fetch(&name)
                .map(Arc::new)
                .map_err(|e| format!("{:#}", e));
            if let Ok(ref loaded) = image {
                log::info!("Loaded image: {} ({}x{})", name, loaded.width(), loaded.height());
            }
            let _ = sender.send(LoadResult {
                name,
                image,
            });
        });
    }

    /// Collect every load that finished since the last call.
    pub fn drain(&self) -> Vec<LoadResult> {
        self.receiver.try_iter().collect()
    }
}
