//! Logging initialization and configuration.

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::error::{Error, Result};

/// Handle to the installed logging subscriber.
///
/// Construct one with [`LogContext::init`] at process start and keep it alive
/// in `main` for the lifetime of the process. Initialization is explicit and
/// happens exactly once; a second attempt returns an error instead of
/// silently replacing or ignoring the installed subscriber.
pub struct LogContext {
    directives: String,
}

impl LogContext {
    /// Install the logging subscriber with the default filter.
    ///
    /// Filtering follows `RUST_LOG` when set, falling back to `info` plus
    /// debug output for the workspace's own crates.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Logging`] if a subscriber is already installed.
    pub fn init() -> Result<Self> {
        Self::init_with_default("info,glimmer=debug")
    }

    /// Install the logging subscriber with a caller-supplied fallback filter.
    ///
    /// `RUST_LOG` still takes precedence when it is set and parseable.
    pub fn init_with_default(default_directives: &str) -> Result<Self> {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_directives));
        let directives = filter.to_string();

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_thread_ids(true))
            .try_init()
            .map_err(|e| Error::Logging(e.to_string()))?;

        Ok(Self { directives })
    }

    /// The filter directives the subscriber was installed with.
    pub fn directives(&self) -> &str {
        &self.directives
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_init_is_an_error() {
        // Whichever test initializes logging first wins the global slot;
        // a repeated attempt must surface as a Logging error either way.
        let _first = LogContext::init_with_default("info");
        let second = LogContext::init_with_default("info");
        assert!(matches!(second, Err(Error::Logging(_))));
    }
}
