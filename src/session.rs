//! Render session state.
//!
//! Holds the current source bitmap and the last published pipeline output. Source
//! loads and renders are tagged with monotonic request tokens; a result whose
//! token is no longer the latest is discarded, so a slow decode or render can
//! never overwrite newer state. Outputs are swapped in whole behind an `Arc`.

use image::RgbaImage;
use rand::Rng;
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::{PixelsError, Result};
use crate::generator::{GenerationRequest, ImageGenerator};
use crate::pipeline::{Pipeline, PipelineOutput, PostProcessConfig};

/// Decoded source bitmap plus a fingerprint of its pixels
#[derive(Debug, Clone)]
pub struct SourceImage {
    pub fingerprint: String,
    pub image: RgbaImage,
}

impl SourceImage {
    pub fn new(image: RgbaImage) -> Self {
        Self {
            fingerprint: fingerprint(&image),
            image,
        }
    }

    /// Decode an encoded payload (PNG, JPEG, ...)
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let image = image::load_from_memory(bytes)?.to_rgba8();
        Ok(Self::new(image))
    }
}

/// SHA-256 over dimensions and RGBA bytes, hex encoded
pub fn fingerprint(image: &RgbaImage) -> String {
    let mut hasher = Sha256::new();
    hasher.update(image.width().to_le_bytes());
    hasher.update(image.height().to_le_bytes());
    hasher.update(image.as_raw());
    format!("{:x}", hasher.finalize())
}

/// Token for one source load (upload or generation)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadTicket(u64);

/// Token for one render, bound to the source it started from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderTicket {
    token: u64,
    source: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// New source stored
    Loaded,
    /// Same pixels as the current source, nothing changed
    Unchanged,
    /// A newer load was issued meanwhile; result dropped
    Stale,
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Default)]
pub struct RenderSession {
    load_requests: AtomicU64,
    render_requests: AtomicU64,
    source: RwLock<Option<Arc<SourceImage>>>,
    output: RwLock<Option<Arc<PipelineOutput>>>,
    last_error: RwLock<Option<String>>,
}

impl RenderSession {
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------------
    // Source
    // ------------------------------------------------------------------------

    /// Start a source load. Supersedes every earlier load and clears the last error.
    pub fn begin_load(&self) -> LoadTicket {
        *write(&self.last_error) = None;
        LoadTicket(self.load_requests.fetch_add(1, Ordering::SeqCst) + 1)
    }

    pub fn is_current_load(&self, ticket: &LoadTicket) -> bool {
        self.load_requests.load(Ordering::SeqCst) == ticket.0
    }

    /// Store a decoded source if `ticket` is still the latest load
    pub fn set_source(&self, ticket: &LoadTicket, source: SourceImage) -> LoadOutcome {
        let mut current = write(&self.source);
        if !self.is_current_load(ticket) {
            tracing::debug!(token = ticket.0, "Discarding stale source load");
            return LoadOutcome::Stale;
        }
        if current.as_ref().map(|s| s.fingerprint.as_str()) == Some(source.fingerprint.as_str()) {
            return LoadOutcome::Unchanged;
        }

        tracing::debug!(
            width = source.image.width(),
            height = source.image.height(),
            fingerprint = %source.fingerprint,
            "Source loaded"
        );
        *current = Some(Arc::new(source));
        LoadOutcome::Loaded
    }

    /// Decode `bytes` and store them as the source
    pub fn load_source(&self, ticket: &LoadTicket, bytes: &[u8]) -> Result<LoadOutcome> {
        let source = SourceImage::decode(bytes)?;
        Ok(self.set_source(ticket, source))
    }

    /// Record a user-visible failure for `ticket`. The last output is kept.
    pub fn fail_load(&self, ticket: &LoadTicket, message: impl Into<String>) -> bool {
        if !self.is_current_load(ticket) {
            return false;
        }
        let message = message.into();
        tracing::warn!(error = %message, "Source load failed");
        *write(&self.last_error) = Some(message);
        true
    }

    pub fn source(&self) -> Option<Arc<SourceImage>> {
        read(&self.source).clone()
    }

    pub fn last_error(&self) -> Option<String> {
        read(&self.last_error).clone()
    }

    // ------------------------------------------------------------------------
    // Output
    // ------------------------------------------------------------------------

    /// Start a render of the current source. Supersedes every earlier render.
    pub fn begin_render(&self) -> RenderTicket {
        let source = read(&self.source).as_ref().map(|s| s.fingerprint.clone());
        RenderTicket {
            token: self.render_requests.fetch_add(1, Ordering::SeqCst) + 1,
            source,
        }
    }

    pub fn is_current_render(&self, ticket: &RenderTicket) -> bool {
        self.render_requests.load(Ordering::SeqCst) == ticket.token
            && read(&self.source).as_ref().map(|s| &s.fingerprint) == ticket.source.as_ref()
    }

    /// Publish `output` if `ticket` is still the latest render of the current source
    pub fn publish(&self, ticket: &RenderTicket, output: PipelineOutput) -> bool {
        let mut slot = write(&self.output);
        if !self.is_current_render(ticket) {
            tracing::debug!(token = ticket.token, "Discarding stale render");
            return false;
        }
        *slot = Some(Arc::new(output));
        true
    }

    /// Most recently published output
    pub fn latest(&self) -> Option<Arc<PipelineOutput>> {
        read(&self.output).clone()
    }

    // ------------------------------------------------------------------------
    // Drivers
    // ------------------------------------------------------------------------

    /// Render the current source on this thread and publish the result
    pub fn render_with<R: Rng>(&self, pipeline: &mut Pipeline<R>, config: &PostProcessConfig) -> bool {
        let ticket = self.begin_render();
        let Some(source) = self.source() else {
            return false;
        };
        match pipeline.process(&source.image, config) {
            Some(output) => self.publish(&ticket, output),
            None => false,
        }
    }

    /// Render on the blocking pool. `Ok(false)` means nothing was published
    /// (no source, or superseded while running).
    pub async fn render(self: &Arc<Self>, config: PostProcessConfig, seed: Option<u64>) -> Result<bool> {
        let ticket = self.begin_render();
        let Some(source) = self.source() else {
            return Ok(false);
        };

        let output = tokio::task::spawn_blocking(move || {
            let mut pipeline = match seed {
                Some(seed) => Pipeline::seeded(seed),
                None => Pipeline::new(),
            };
            pipeline.process(&source.image, &config)
        })
        .await
        .map_err(|e| PixelsError::Processing(format!("Task join error: {}", e)))?;

        Ok(match output {
            Some(output) => self.publish(&ticket, output),
            None => false,
        })
    }

    /// Ask `generator` for a new source. Failures are recorded as the session's
    /// last error and returned; the last published output stays in place.
    pub async fn generate(
        self: &Arc<Self>,
        generator: Arc<dyn ImageGenerator>,
        request: GenerationRequest,
    ) -> Result<LoadOutcome> {
        let ticket = self.begin_load();

        let result = tokio::task::spawn_blocking(move || {
            let bytes = generator.generate(&request)?;
            if bytes.is_empty() {
                return Err(PixelsError::Generator("No image data received".to_string()));
            }
            SourceImage::decode(&bytes)
        })
        .await
        .map_err(|e| PixelsError::Processing(format!("Task join error: {}", e)))?;

        match result {
            Ok(source) => Ok(self.set_source(&ticket, source)),
            Err(e) => {
                self.fail_load(&ticket, e.to_string());
                Err(e)
            }
        }
    }
}
