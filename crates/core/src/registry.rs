//! Engines keyed by operation class
//!
//! Callers that guard many dependencies keep one [`EngineRegistry`] and look
//! engines up by class name, so every caller of a class shares the same
//! breaker, bulkhead and limiter state.

use std::sync::Arc;

use bulwark_common::SystemClock;
use bulwark_domain::{ConfigError, ConfigResult, EngineSettings, ResilienceConfig};
use dashmap::DashMap;
use tracing::{debug, info};

use crate::engine::{ResilienceEngine, SharedClock};
use crate::ports::{NoopSink, TelemetrySink};

/// Concurrent map of operation class to engine
pub struct EngineRegistry {
    engines: DashMap<String, Arc<ResilienceEngine>>,
    default_config: ResilienceConfig,
    sink: Arc<dyn TelemetrySink>,
    clock: SharedClock,
}

impl EngineRegistry {
    /// Registry without telemetry, reading the system clock
    pub fn new(settings: EngineSettings) -> ConfigResult<Self> {
        Self::with_parts(settings, Arc::new(NoopSink), Arc::new(SystemClock))
    }

    /// Build an engine for every configured class
    ///
    /// Fails on the first class whose configuration is invalid. Classes
    /// looked up later through [`EngineRegistry::get_or_default`] use the
    /// settings' default configuration, or a pass-through one.
    pub fn with_parts(
        settings: EngineSettings,
        sink: Arc<dyn TelemetrySink>,
        clock: SharedClock,
    ) -> ConfigResult<Self> {
        settings.validate()?;

        let EngineSettings { default, classes } = settings;
        let registry = Self {
            engines: DashMap::with_capacity(classes.len()),
            default_config: default.unwrap_or_default(),
            sink,
            clock,
        };
        for (class, config) in classes {
            let engine = registry
                .build(&class, config)
                .map_err(|err| ConfigError::in_class(class.clone(), err))?;
            registry.engines.insert(class, Arc::new(engine));
        }

        info!(classes = registry.engines.len(), "engine registry ready");
        Ok(registry)
    }

    /// Engine for a configured or previously created class
    pub fn get(&self, class: &str) -> Option<Arc<ResilienceEngine>> {
        self.engines.get(class).map(|entry| Arc::clone(entry.value()))
    }

    /// Engine for a class that must already exist
    pub fn require(&self, class: &str) -> ConfigResult<Arc<ResilienceEngine>> {
        self.get(class).ok_or_else(|| ConfigError::UnknownClass(class.to_string()))
    }

    /// Engine for `class`, created from the default configuration if missing
    pub fn get_or_default(&self, class: &str) -> ConfigResult<Arc<ResilienceEngine>> {
        if let Some(engine) = self.get(class) {
            return Ok(engine);
        }

        let entry = self.engines.entry(class.to_string()).or_try_insert_with(|| {
            debug!(class, "creating engine from default configuration");
            self.build(class, self.default_config.clone()).map(Arc::new)
        })?;
        Ok(Arc::clone(entry.value()))
    }

    /// Create or replace the engine for `class`
    ///
    /// A replaced engine keeps serving callers that already hold it; new
    /// lookups get fresh state.
    pub fn insert(
        &self,
        class: impl Into<String>,
        config: ResilienceConfig,
    ) -> ConfigResult<Arc<ResilienceEngine>> {
        let class = class.into();
        let engine = Arc::new(self.build(&class, config)?);
        if self.engines.insert(class.clone(), Arc::clone(&engine)).is_some() {
            info!(class = %class, "replaced engine");
        }
        Ok(engine)
    }

    /// Registered class names, sorted
    pub fn classes(&self) -> Vec<String> {
        let mut classes: Vec<String> = self.engines.iter().map(|entry| entry.key().clone()).collect();
        classes.sort_unstable();
        classes
    }

    pub fn len(&self) -> usize {
        self.engines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.engines.is_empty()
    }

    fn build(&self, class: &str, config: ResilienceConfig) -> ConfigResult<ResilienceEngine> {
        ResilienceEngine::builder(class, config)
            .sink(Arc::clone(&self.sink))
            .clock(Arc::clone(&self.clock))
            .build()
    }
}

impl std::fmt::Debug for EngineRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineRegistry").field("classes", &self.classes()).finish_non_exhaustive()
    }
}
