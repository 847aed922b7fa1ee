//! State shared by every template of one build.
//!
//! Holds what would otherwise be process-wide caches: compiled shared resets,
//! written-artifact hashes, image dimensions and in-flight fetches.

use crate::{
    config::KilnConfig,
    images::ImageSizer,
    log,
    output::{OutputWriter, PendingWrites},
    render::{Partials, RenderOptions, Renderer, create_renderer},
    style::StyleCompiler,
};
use anyhow::Result;
use std::sync::Arc;

pub struct BuildContext {
    pub config: KilnConfig,
    pub output: Arc<OutputWriter>,
    pub pending: Arc<PendingWrites>,
    pub styles: StyleCompiler,
    pub renderer: Arc<dyn Renderer>,
    pub render_options: RenderOptions,
    pub images: Arc<ImageSizer>,
}

impl BuildContext {
    /// Load partials, pick the render engine and open the image cache.
    /// Must run inside a tokio runtime.
    pub fn new(config: KilnConfig) -> Result<Self> {
        let partials = Partials::load(&config.render.components, &config.render.extensions)?;
        if !partials.is_empty() {
            log!("build"; "loaded {} partials", partials.len());
        }
        let renderer = create_renderer(config.render.engine, &partials)?;

        let output = Arc::new(OutputWriter::new(&config.build.output));
        let pending = Arc::new(PendingWrites::default());
        let styles = StyleCompiler::new(&config, output.clone(), pending.clone());
        let images = Arc::new(ImageSizer::new(&config, output.clone()));

        Ok(Self {
            render_options: RenderOptions::from_config(&config),
            config,
            output,
            pending,
            styles,
            renderer,
            images,
        })
    }

    /// Wait for background stylesheet writes and the image cache writer.
    pub async fn finish(&self) {
        self.pending.drain().await;
        self.images.close().await;
    }
}
