//! Error types for imgsync
//!
//! Every failure surfaces with enough context (registry, repository, tag,
//! engine endpoint) to diagnose it without re-running in verbose mode.

use thiserror::Error;


/// Main error type for imgsync operations
#[derive(Error, Debug)]
pub enum SyncError {
    /// Malformed image reference string
    #[error("Invalid image reference '{input}': {message}")]
    Parse { input: String, message: String },

    /// Missing or rejected credentials for a registry
    #[error("Authentication error for {registry} (status: {status_code:?}): {message}")]
    Auth {
        registry: String,
        message: String,
        status_code: Option<u16>,
    },

    /// Manifest fetch or token exchange failure
    #[error("Registry error for {registry}/{repository}:{tag}: {message}")]
    Registry {
        registry: String,
        repository: String,
        tag: String,
        message: String,
        status_code: Option<u16>,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Tag, push, pull or list failure against the local engine
    #[error("Engine error: {message}")]
    Engine {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration errors (invalid config file, conflicting settings)
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        path: Option<String>,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A streaming engine operation was aborted by its caller
    #[error("Operation cancelled: {operation}")]
    Cancelled { operation: String },
}

/// Result type alias for imgsync operations
pub type Result<T> = std::result::Result<T, SyncError>;

impl SyncError {
    /// Creates a new parse error.
    ///
    /// # Examples
    ///
    /// ```
    /// use libimgsync::error::SyncError;
    ///
    /// let err = SyncError::parse("", "reference is empty");
    /// assert!(matches!(err, SyncError::Parse { .. }));
    /// ```
    pub fn parse<S: Into<String>, M: Into<String>>(input: S, message: M) -> Self {
        Self::Parse {
            input: input.into(),
            message: message.into(),
        }
    }

    /// Creates a new authentication error.
    ///
    /// # Examples
    ///
    /// ```
    /// use libimgsync::error::SyncError;
    ///
    /// let err = SyncError::auth("https://registry.example.com", "invalid credentials", Some(401));
    /// assert!(matches!(err, SyncError::Auth { .. }));
    /// ```
    pub fn auth<R: Into<String>, M: Into<String>>(
        registry: R,
        message: M,
        status_code: Option<u16>,
    ) -> Self {
        Self::Auth {
            registry: registry.into(),
            message: message.into(),
            status_code,
        }
    }

    /// Creates a new registry error for a manifest location.
    ///
    /// # Examples
    ///
    /// ```
    /// use libimgsync::error::SyncError;
    ///
    /// let err = SyncError::registry("https://ghcr.io", "user/app", "latest", "manifest unknown");
    /// assert!(err.to_string().contains("user/app:latest"));
    /// ```
    pub fn registry<R, P, T, M>(registry: R, repository: P, tag: T, message: M) -> Self
    where
        R: Into<String>,
        P: Into<String>,
        T: Into<String>,
        M: Into<String>,
    {
        Self::Registry {
            registry: registry.into(),
            repository: repository.into(),
            tag: tag.into(),
            message: message.into(),
            status_code: None,
            source: None,
        }
    }

    /// Creates a new engine error.
    ///
    /// # Examples
    ///
    /// ```
    /// use libimgsync::error::SyncError;
    ///
    /// let err = SyncError::engine("no such image: alpine:3.10");
    /// assert!(matches!(err, SyncError::Engine { .. }));
    /// ```
    pub fn engine<S: Into<String>>(message: S) -> Self {
        Self::Engine {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new engine error with a source error.
    pub fn engine_with_source<S, E>(message: S, source: E) -> Self
    where
        S: Into<String>,
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Engine {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates a new configuration error.
    ///
    /// # Examples
    ///
    /// ```
    /// use libimgsync::error::SyncError;
    ///
    /// let err = SyncError::config("cert_path must not be specified", None::<String>);
    /// assert!(matches!(err, SyncError::Config { .. }));
    /// ```
    pub fn config<S: Into<String>, P: Into<String>>(message: S, path: Option<P>) -> Self {
        Self::Config {
            message: message.into(),
            path: path.map(|p| p.into()),
            source: None,
        }
    }

    /// Creates a new configuration error with a source error.
    pub fn config_with_source<S, P, E>(message: S, path: Option<P>, source: E) -> Self
    where
        S: Into<String>,
        P: Into<String>,
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Config {
            message: message.into(),
            path: path.map(|p| p.into()),
            source: Some(Box::new(source)),
        }
    }

    /// Creates a new cancellation error.
    pub fn cancelled<S: Into<String>>(operation: S) -> Self {
        Self::Cancelled {
            operation: operation.into(),
        }
    }

    /// Attaches an HTTP status code to a registry error. Other variants are
    /// returned unchanged.
    pub fn with_status(mut self, code: u16) -> Self {
        if let Self::Registry { status_code, .. } = &mut self {
            *status_code = Some(code);
        }
        self
    }

    /// Attaches a source error to a registry error. Other variants are
    /// returned unchanged.
    pub fn with_source<E>(mut self, error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        if let Self::Registry { source, .. } = &mut self {
            *source = Some(Box::new(error));
        }
        self
    }

    /// Returns true for authentication failures.
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Auth { .. })
    }
}
