//! Generation pipeline and its boundary result.
//!
//! [`QrService`] owns the collaborators and the shared state (render cache,
//! rate limiter, history store) and runs one request through:
//!
//! ```text
//! rate limit → validate → fingerprint → cache ─┬─ hit: stored bytes
//!                                              └─ miss: encode → render → logo → frame → codec
//!                                                       → write file → history
//! ```
//!
//! Every failure is a [`Failure`] carrying an [`ErrorKind`], so callers can
//! decide mechanically whether a retry is worthwhile. Validation happens
//! before any pixel buffer exists, and nothing is cached or recorded when a
//! stage fails.

use crate::bounded::run_with_timeout;
use crate::cache::{CacheEntry, CacheManifest, CacheStats, Fingerprint, RenderCache, Rendered};
use crate::config::{ConfigError, ServiceConfig};
use crate::history::{GenerationRecord, HistoryError, HistoryStore, JsonlHistory};
use crate::imaging::logo::overlay;
use crate::imaging::{
    CodecError, DefaultLogoSource, ImageCodec, LogoError, LogoSource, RustCodec, add_frame, render,
};
use crate::matrix::{EcLevelRequest, EncodeError, QrcodeEncoder, SymbolEncoder};
use crate::ratelimit::{Budget, RateLimitExceeded, RateLimiter};
use crate::style::{GenerateRequest, OutputFormat, StyleConfig, StyleError};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chrono::{TimeDelta, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

// =============================================================================
// Failures
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    InvalidColorFormat,
    MissingConditionalField,
    InvalidField,
    UnsupportedFrameFeature,
    LogoFetchFailure,
    EncodingFailure,
    RateLimitExceeded,
}

impl ErrorKind {
    /// Whether an identical request may succeed later.
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            ErrorKind::LogoFetchFailure | ErrorKind::EncodingFailure | ErrorKind::RateLimitExceeded
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            ErrorKind::InvalidColorFormat => "InvalidColorFormat",
            ErrorKind::MissingConditionalField => "MissingConditionalField",
            ErrorKind::InvalidField => "InvalidField",
            ErrorKind::UnsupportedFrameFeature => "UnsupportedFrameFeature",
            ErrorKind::LogoFetchFailure => "LogoFetchFailure",
            ErrorKind::EncodingFailure => "EncodingFailure",
            ErrorKind::RateLimitExceeded => "RateLimitExceeded",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A request that did not produce an image.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct Failure {
    pub kind: ErrorKind,
    pub message: String,
    /// Seconds to wait, for [`ErrorKind::RateLimitExceeded`].
    pub retry_after: Option<u64>,
}

impl Failure {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            retry_after: None,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}

impl From<StyleError> for Failure {
    fn from(e: StyleError) -> Self {
        let kind = match &e {
            StyleError::InvalidColor { .. } => ErrorKind::InvalidColorFormat,
            StyleError::MissingField(_) => ErrorKind::MissingConditionalField,
            StyleError::InvalidField { .. } => ErrorKind::InvalidField,
            StyleError::UnknownFrameStyle(_) => ErrorKind::UnsupportedFrameFeature,
        };
        Failure::new(kind, e.to_string())
    }
}

impl From<RateLimitExceeded> for Failure {
    fn from(e: RateLimitExceeded) -> Self {
        Failure {
            retry_after: Some(e.retry_after_secs()),
            ..Failure::new(ErrorKind::RateLimitExceeded, e.to_string())
        }
    }
}

impl From<EncodeError> for Failure {
    fn from(e: EncodeError) -> Self {
        Failure::new(ErrorKind::EncodingFailure, e.to_string())
    }
}

impl From<CodecError> for Failure {
    fn from(e: CodecError) -> Self {
        Failure::new(ErrorKind::EncodingFailure, e.to_string())
    }
}

impl From<LogoError> for Failure {
    fn from(e: LogoError) -> Self {
        let kind = match e {
            LogoError::Fetch { .. } | LogoError::Decode { .. } => ErrorKind::LogoFetchFailure,
            LogoError::Embed(_) => ErrorKind::EncodingFailure,
        };
        Failure::new(kind, e.to_string())
    }
}

/// Errors constructing or persisting the service itself.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Logo(#[from] LogoError),
}

// =============================================================================
// Results
// =============================================================================

/// A finished image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generated {
    pub bytes: Vec<u8>,
    /// True when no render ran for this call (stored or shared in-flight result).
    pub cache_hit: bool,
    /// Where the image was written, if writing succeeded.
    pub file: Option<PathBuf>,
    pub fingerprint: Fingerprint,
    pub format: OutputFormat,
}

/// JSON shape handed to HTTP-style callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponse {
    pub success: bool,
    /// Base64 image bytes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_hit: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}

impl GenerateResponse {
    pub fn from_result(result: &Result<Generated, Failure>) -> Self {
        match result {
            Ok(generated) => GenerateResponse {
                success: true,
                data: Some(STANDARD.encode(&generated.bytes)),
                cache_hit: Some(generated.cache_hit),
                url: generated.file.as_ref().map(|p| p.display().to_string()),
                error_kind: None,
                message: None,
                retry_after: None,
            },
            Err(failure) => GenerateResponse {
                success: false,
                data: None,
                cache_hit: None,
                url: None,
                error_kind: Some(failure.kind),
                message: Some(failure.message.clone()),
                retry_after: failure.retry_after,
            },
        }
    }
}

/// Outcome of validating a request without rendering it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checked {
    pub style: StyleConfig,
    pub fingerprint: Fingerprint,
    /// A committed render for this request is currently cached.
    pub cached: bool,
}

// =============================================================================
// Service
// =============================================================================

pub struct QrService {
    config: ServiceConfig,
    encoder: Arc<dyn SymbolEncoder>,
    logo_source: Arc<dyn LogoSource>,
    codec: Arc<dyn ImageCodec>,
    history: Arc<dyn HistoryStore>,
    cache: RenderCache<Failure>,
    limiter: RateLimiter,
}

impl QrService {
    /// Build a service with the default collaborators. Restores the cache
    /// manifest from `output_dir` when persistence is enabled.
    pub fn new(config: ServiceConfig) -> Result<Self, ServiceError> {
        config.validate()?;
        let logo_source = DefaultLogoSource::new(config.timeouts.logo_fetch())?;
        let history = JsonlHistory::new(config.history_path());
        let cache = RenderCache::new(TimeDelta::hours(i64::from(config.cache.ttl_hours)));
        log::debug!(
            "history at {}, cache ttl {}h",
            history.path().display(),
            cache.ttl().num_hours()
        );
        if config.cache.persist {
            let restored = cache.restore(CacheManifest::load(&config.output_dir));
            if restored > 0 {
                log::info!("restored {restored} cached renders");
            }
        }
        let limiter = RateLimiter::new(
            config.limits.single_per_minute,
            config.limits.bulk_per_minute,
            config.limits.window(),
        );
        Ok(Self {
            config,
            encoder: Arc::new(QrcodeEncoder::default()),
            logo_source: Arc::new(logo_source),
            codec: Arc::new(RustCodec),
            history: Arc::new(history),
            cache,
            limiter,
        })
    }

    pub fn with_encoder(mut self, encoder: Arc<dyn SymbolEncoder>) -> Self {
        self.encoder = encoder;
        self
    }

    pub fn with_logo_source(mut self, source: Arc<dyn LogoSource>) -> Self {
        self.logo_source = source;
        self
    }

    pub fn with_codec(mut self, codec: Arc<dyn ImageCodec>) -> Self {
        self.codec = codec;
        self
    }

    pub fn with_history(mut self, history: Arc<dyn HistoryStore>) -> Self {
        self.history = history;
        self
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Generate one image. `client` is rate limited against the single
    /// budget; `None` is a trusted local caller and is not limited.
    pub fn generate(
        &self,
        request: &GenerateRequest,
        client: Option<IpAddr>,
    ) -> Result<Generated, Failure> {
        if let Some(ip) = client {
            self.limiter.check(ip, Budget::Single)?;
        }
        self.generate_unmetered(request)
    }

    /// Generate a batch. The bulk budget is charged once for the whole
    /// batch; items then run in parallel and results keep input order.
    pub fn generate_bulk(
        &self,
        requests: &[GenerateRequest],
        client: Option<IpAddr>,
    ) -> Result<Vec<Result<Generated, Failure>>, Failure> {
        if let Some(ip) = client {
            self.limiter.check(ip, Budget::Bulk)?;
        }
        log::info!("bulk generation of {} requests", requests.len());
        Ok(requests
            .par_iter()
            .map(|request| self.generate_unmetered(request))
            .collect())
    }

    /// Validate and fingerprint without rendering.
    pub fn check(&self, request: &GenerateRequest) -> Result<Checked, Failure> {
        let style = request.validate()?;
        let fingerprint = fingerprint(&style, request.content())?;
        let cached = self.cache.get(&fingerprint).is_some();
        Ok(Checked {
            style,
            fingerprint,
            cached,
        })
    }

    /// Most recent generations, newest first. Defaults to the configured
    /// listing size.
    pub fn history(&self, limit: Option<usize>) -> Result<Vec<GenerationRecord>, HistoryError> {
        self.history
            .recent(limit.unwrap_or(self.config.history.max_listed))
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Number of pipeline runs so far, failed ones included.
    pub fn render_count(&self) -> u32 {
        self.cache.stats().renders
    }

    /// Write the cache manifest when persistence is enabled. Returns the
    /// number of entries saved.
    pub fn persist_cache(&self) -> Result<usize, ServiceError> {
        if !self.config.cache.persist {
            return Ok(0);
        }
        let purged = self.cache.purge_expired();
        if purged > 0 {
            log::debug!("purged {purged} expired cache entries");
        }
        let manifest = self.cache.manifest();
        fs::create_dir_all(&self.config.output_dir)?;
        manifest.save(&self.config.output_dir)?;
        Ok(manifest.entries.len())
    }

    fn generate_unmetered(&self, request: &GenerateRequest) -> Result<Generated, Failure> {
        let style = request.validate()?;
        let content = request.content();
        let fingerprint = fingerprint(&style, content)?;

        let (entry, lookup) = self.cache.get_or_render(&fingerprint, || {
            self.render_and_store(request, &style, content, &fingerprint)
        })?;
        let bytes = entry_bytes(&entry)?;
        Ok(Generated {
            bytes,
            cache_hit: lookup.is_hit(),
            file: entry.file.map(|name| self.config.output_dir.join(name)),
            fingerprint,
            format: style.format,
        })
    }

    /// The cache-miss path.
    fn render_and_store(
        &self,
        request: &GenerateRequest,
        style: &StyleConfig,
        content: &str,
        fingerprint: &Fingerprint,
    ) -> Result<Rendered, Failure> {
        let started = Instant::now();
        let matrix = self.encoder.encode(content, EcLevelRequest::High)?;
        log::debug!(
            "{}: encoded {}x{} modules",
            fingerprint.short(),
            matrix.size(),
            matrix.size()
        );

        let mut image = render(&matrix, style);

        if let Some(location) = &style.logo {
            let source = Arc::clone(&self.logo_source);
            let target = location.clone();
            let logo = run_with_timeout(self.config.timeouts.logo_fetch(), move || {
                source.fetch(&target)
            })
            .map_err(|e| Failure::new(ErrorKind::LogoFetchFailure, format!("logo fetch {e}")))??;
            overlay(&mut image, &logo)?;
        }

        if let Some(frame) = &style.frame {
            image = add_frame(image, frame);
        }

        let codec = Arc::clone(&self.codec);
        let format = style.format;
        let bytes = run_with_timeout(self.config.timeouts.encode(), move || {
            codec.encode(&image, format)
        })
        .map_err(|e| Failure::new(ErrorKind::EncodingFailure, format!("image encoding {e}")))??;

        let file = self.write_output(fingerprint, format, &bytes);
        self.record(request, style, content, file.clone());
        log::info!(
            "generated {} ({} bytes, {:?})",
            fingerprint.short(),
            bytes.len(),
            started.elapsed()
        );
        Ok(Rendered { bytes, file })
    }

    /// Write the image under `output_dir`. Returns the file name, or `None`
    /// when the write failed (the image is still returned to the caller).
    fn write_output(
        &self,
        fingerprint: &Fingerprint,
        format: OutputFormat,
        bytes: &[u8],
    ) -> Option<String> {
        let name = format!("{}.{}", fingerprint.short(), format.extension());
        let path = self.config.output_dir.join(&name);
        match fs::create_dir_all(&self.config.output_dir).and_then(|()| fs::write(&path, bytes)) {
            Ok(()) => Some(name),
            Err(e) => {
                log::warn!("could not write {}: {e}", path.display());
                None
            }
        }
    }

    fn record(
        &self,
        request: &GenerateRequest,
        style: &StyleConfig,
        content: &str,
        file: Option<String>,
    ) {
        let configuration = serde_json::to_value(request).unwrap_or(serde_json::Value::Null);
        let record = GenerationRecord {
            category: style.category.name().to_string(),
            content: content.to_string(),
            configuration,
            output_format: style.format.extension().to_string(),
            file_path: file,
            created_at: Utc::now(),
        };
        if let Err(e) = self.history.append(&record) {
            log::warn!("could not record generation: {e}");
        }
    }
}

fn fingerprint(style: &StyleConfig, content: &str) -> Result<Fingerprint, Failure> {
    Fingerprint::compute(style, content)
        .map_err(|e| Failure::new(ErrorKind::EncodingFailure, format!("fingerprint: {e}")))
}

fn entry_bytes(entry: &CacheEntry) -> Result<Vec<u8>, Failure> {
    entry
        .bytes()
        .map_err(|e| Failure::new(ErrorKind::EncodingFailure, format!("corrupt cache entry: {e}")))
}
