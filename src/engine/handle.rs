//! Shared decode engine runtime.
//!
//! Engines backed by an embedded runtime must have exactly one runtime per
//! process. Instead of a global singleton, the runtime is an explicitly
//! constructed [`EngineHandle`] shared through `Arc`: the scope that creates
//! it decides its lifetime, each reader holds a clone, and the runtime is shut
//! down exactly once when the last clone is dropped.
//!
//! # Example
//!
//! ```ignore
//! use image_series_reader::engine::{CompanionProvider, EngineHandle};
//! use image_series_reader::series::SeriesReader;
//!
//! let handle = EngineHandle::new(CompanionProvider::new());
//! let mut first = SeriesReader::new(handle.clone(), Default::default())?;
//! let mut second = SeriesReader::new(handle.clone(), Default::default())?;
//! assert_eq!(handle.active_sessions(), 2);
//! ```

use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tracing::{debug, info};

use super::DecodeEngine;
use crate::error::EngineError;

// =============================================================================
// EngineProvider Trait
// =============================================================================

/// Creates engine sessions on top of a shared runtime.
pub trait EngineProvider: Send + Sync {
    /// The engine type this provider creates.
    type Engine: DecodeEngine;

    /// Human-readable name of the engine, used in logs.
    fn name(&self) -> &str;

    /// Create a new engine session.
    fn create_engine(&self) -> Result<Self::Engine, EngineError>;

    /// Release runtime-wide resources. Called exactly once.
    fn shutdown(&self) {}
}

// =============================================================================
// EngineHandle
// =============================================================================

/// Explicitly shared handle to one decode engine runtime.
pub struct EngineHandle<P: EngineProvider> {
    provider: P,

    /// Sessions currently alive
    active: AtomicUsize,

    /// Sessions created over the handle's lifetime
    created: AtomicUsize,
}

impl<P: EngineProvider> EngineHandle<P> {
    /// Start a runtime around a provider.
    pub fn new(provider: P) -> Arc<Self> {
        info!(engine = provider.name(), "Decode engine runtime started");
        Arc::new(Self {
            provider,
            active: AtomicUsize::new(0),
            created: AtomicUsize::new(0),
        })
    }

    /// The underlying provider.
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Number of sessions currently alive.
    pub fn active_sessions(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Number of sessions created so far.
    pub fn sessions_created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    /// Create a session bound to this runtime.
    pub fn create_session(self: &Arc<Self>) -> Result<EngineSession<P>, EngineError> {
        let engine = self.provider.create_engine()?;
        self.active.fetch_add(1, Ordering::SeqCst);
        self.created.fetch_add(1, Ordering::SeqCst);
        debug!(
            engine = self.provider.name(),
            active = self.active_sessions(),
            "Engine session created"
        );
        Ok(EngineSession {
            handle: Arc::clone(self),
            engine,
        })
    }
}

impl<P: EngineProvider> Drop for EngineHandle<P> {
    fn drop(&mut self) {
        self.provider.shutdown();
        info!(engine = self.provider.name(), "Decode engine runtime shut down");
    }
}

// =============================================================================
// EngineSession
// =============================================================================

/// One engine instance, keeping its runtime alive for as long as it exists.
pub struct EngineSession<P: EngineProvider> {
    handle: Arc<EngineHandle<P>>,
    engine: P::Engine,
}

impl<P: EngineProvider> EngineSession<P> {
    /// The runtime this session belongs to.
    pub fn handle(&self) -> &Arc<EngineHandle<P>> {
        &self.handle
    }
}

impl<P: EngineProvider> Deref for EngineSession<P> {
    type Target = P::Engine;

    fn deref(&self) -> &Self::Target {
        &self.engine
    }
}

impl<P: EngineProvider> DerefMut for EngineSession<P> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.engine
    }
}

impl<P: EngineProvider> Drop for EngineSession<P> {
    fn drop(&mut self) {
        self.handle.active.fetch_sub(1, Ordering::SeqCst);
    }
}
