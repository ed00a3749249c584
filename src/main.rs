// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! annotate-node - point and mask annotation node
//!
//! Desktop host for one annotation node: pick an image, place point markers
//! and paint a mask inline or in the modal editor, and save the persisted
//! fields as a workflow file.

mod app;

use annotate_node::config::AppConfig;
use anyhow::Result;
use app::AnnotateApp;
use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "annotate-node", version, about = "Point and mask annotation node")]
struct Args {
    /// YAML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Local directory to read images from
    #[arg(long)]
    input_dir: Option<PathBuf>,

    /// Image server base URL, e.g. http://127.0.0.1:8188
    #[arg(long)]
    server: Option<String>,

    /// Remote save endpoint for the modal editor
    #[arg(long)]
    save_endpoint: Option<String>,

    /// Image to select on startup
    image: Option<String>,
}

fn load_config(args: &Args) -> Result<AppConfig> {
    let mut config = match &args.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };
    if let Some(dir) = &args.input_dir {
        config.server.input_dir = dir.clone();
    }
    if let Some(url) = &args.server {
        config.server.base_url = Some(url.clone());
    }
    if let Some(url) = &args.save_endpoint {
        config.server.save_endpoint = Some(url.clone());
    }
    Ok(config)
}

fn main() -> Result<()> {
    // Initialize logging
    env_logger::init();

    let args = Args::parse();
    let config = load_config(&args)?;
    log::info!("Image source: {}", match &config.server.base_url {
        Some(url) => url.clone(),
        None => config.server.input_dir.display().to_string(),
    });

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 800.0])
            .with_min_inner_size([800.0, 600.0])
            .with_title("Annotate Node"),
        ..Default::default()
    };

    let initial_image = args.image;
    eframe::run_native(
        "annotate-node",
        options,
        Box::new(move |_cc| Ok(Box::new(AnnotateApp::new(config, initial_image)))),
    )
    .map_err(|e| anyhow::anyhow!("Application error: {}", e))?;

    Ok(())
}
