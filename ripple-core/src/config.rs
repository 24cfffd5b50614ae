//! Runtime Configuration
//!
//! Configuration is installed per thread. The reactive runtime is
//! single-threaded: the tracking stack, the update queue and the tick queue
//! are all thread-local, so the settings that steer them live next to them.
//!
//! This module also owns the two reporting channels used by the rest of the
//! crate: [`warn`] for misuse that is not fatal, and [`handle_error`] for
//! errors that are reported instead of propagated.

use std::cell::RefCell;
use std::fmt;
use std::sync::Arc;

use serde::Deserialize;

use crate::error::{Error, Result};

/// Receives errors that the runtime reports instead of propagating.
///
/// The second argument describes where the error happened.
pub type ErrorHandler = Arc<dyn Fn(&Error, &str) + Send + Sync>;

/// Receives warning messages.
pub type WarnHandler = Arc<dyn Fn(&str) + Send + Sync>;

/// Default cap on how often one subscriber may re-run within a single flush.
pub const MAX_UPDATE_COUNT: usize = 100;

/// Runtime settings.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// How many times a single subscriber may re-run in one flush before it is
    /// treated as a runaway update loop.
    pub max_update_count: usize,

    /// When false, queued subscribers flush synchronously inside `enqueue`
    /// and dependency sets notify their subscribers in creation order.
    pub async_flush: bool,

    /// Suppress all warnings.
    pub silent: bool,

    #[serde(skip)]
    pub error_handler: Option<ErrorHandler>,

    #[serde(skip)]
    pub warn_handler: Option<WarnHandler>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_update_count: MAX_UPDATE_COUNT,
            async_flush: true,
            silent: false,
            error_handler: None,
            warn_handler: None,
        }
    }
}

impl Config {
    /// Parse settings from JSON. Missing fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn with_error_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&Error, &str) + Send + Sync + 'static,
    {
        self.error_handler = Some(Arc::new(handler));
        self
    }

    pub fn with_warn_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.warn_handler = Some(Arc::new(handler));
        self
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("max_update_count", &self.max_update_count)
            .field("async_flush", &self.async_flush)
            .field("silent", &self.silent)
            .field("error_handler", &self.error_handler.is_some())
            .field("warn_handler", &self.warn_handler.is_some())
            .finish()
    }
}

thread_local! {
    static CONFIG: RefCell<Config> = RefCell::new(Config::default());
}

/// Install settings for the current thread, returning the previous ones.
pub fn set(config: Config) -> Config {
    CONFIG.with(|c| std::mem::replace(&mut *c.borrow_mut(), config))
}

/// A copy of the current thread's settings.
pub fn get() -> Config {
    CONFIG.with(|c| c.borrow().clone())
}

/// Read the current settings without cloning them.
pub fn with<R>(f: impl FnOnce(&Config) -> R) -> R {
    CONFIG.with(|c| f(&c.borrow()))
}

/// Report a non-fatal misuse.
pub fn warn(message: &str) {
    let (silent, handler) = with(|c| (c.silent, c.warn_handler.clone()));
    if silent {
        return;
    }
    match handler {
        Some(handler) => handler(message),
        None => tracing::warn!(target: "ripple", "{message}"),
    }
}

/// Report an error that is not propagated to the caller.
pub fn handle_error(error: &Error, info: &str) {
    match with(|c| c.error_handler.clone()) {
        Some(handler) => handler(error, info),
        None => tracing::error!(target: "ripple", %error, info, "unhandled error"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.max_update_count, 100);
        assert!(config.async_flush);
        assert!(!config.silent);
    }

    #[test]
    fn parses_partial_json() {
        let config = Config::from_json(r#"{ "max_update_count": 5, "silent": true }"#).unwrap();
        assert_eq!(config.max_update_count, 5);
        assert!(config.silent);
        assert!(config.async_flush);

        assert!(matches!(Config::from_json("{"), Err(Error::Config(_))));
    }

    #[test]
    fn warnings_route_to_handler_unless_silent() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let previous = set(Config::default().with_warn_handler(move |m| sink.lock().push(m.to_string())));

        warn("first");
        let mut silent = get();
        silent.silent = true;
        set(silent);
        warn("second");

        set(previous);
        assert_eq!(*seen.lock(), vec!["first".to_string()]);
    }

    #[test]
    fn errors_route_to_handler() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let previous = set(Config::default().with_error_handler(move |e, info| {
            sink.lock().push(format!("{info}: {e}"));
        }));

        handle_error(&Error::InvalidPath("a b".into()), "watch");

        set(previous);
        assert_eq!(seen.lock().len(), 1);
        assert!(seen.lock()[0].starts_with("watch: "));
    }
}
