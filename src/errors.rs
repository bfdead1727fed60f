//! Error handling for the log hook
//!
//! Only construction and shutdown are allowed to fail loudly. Per-event
//! delivery problems never come back through these types to the caller of
//! `handle`; they are reported through the error sink's failure callback.

use thiserror::Error;

/// Main error type for the log hook
#[derive(Error, Debug)]
pub enum HookError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Invalid project identifier '{project_id}': {reason}")]
    InvalidProject { project_id: String, reason: String },

    #[error("Sink unavailable: {sink} - {message}")]
    SinkUnavailable { sink: String, message: String },

    #[error("Sink closed: {sink}")]
    SinkClosed { sink: String },

    #[error("Sink queue full: {sink}")]
    SinkFull { sink: String },

    #[error("I/O operation failed: {operation}")]
    Io {
        operation: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization failed: {context}")]
    Serialization {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Shutdown failed: {sink} - {message}")]
    Shutdown { sink: String, message: String },

    #[error("Mutex lock failed: {resource}")]
    MutexPoisoned { resource: String },
}

/// Type alias for Result with HookError
pub type HookResult<T> = Result<T, HookError>;

impl HookError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an invalid project identifier error
    pub fn invalid_project(project_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidProject {
            project_id: project_id.into(),
            reason: reason.into(),
        }
    }

    /// Create a sink establishment error
    pub fn sink_unavailable(sink: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkUnavailable {
            sink: sink.into(),
            message: message.into(),
        }
    }

    /// Create an error for a submission to a sink that has already been closed
    pub fn sink_closed(sink: impl Into<String>) -> Self {
        Self::SinkClosed { sink: sink.into() }
    }

    /// Create an error for a submission dropped because the sink's queue is full
    pub fn sink_full(sink: impl Into<String>) -> Self {
        Self::SinkFull { sink: sink.into() }
    }

    /// Create an I/O error
    pub fn io(operation: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            source,
        }
    }

    /// Create a serialization error
    pub fn serialization(context: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Serialization {
            context: context.into(),
            source,
        }
    }

    /// Create a shutdown error
    pub fn shutdown(sink: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Shutdown {
            sink: sink.into(),
            message: message.into(),
        }
    }
}

/// Helper trait for safe mutex operations
///
/// Returns a HookError on poison instead of panicking.
pub trait SafeLock<T: ?Sized> {
    /// Safely lock a mutex, returning a HookError on poison
    fn safe_lock(&self) -> HookResult<std::sync::MutexGuard<'_, T>>;
}

impl<T: ?Sized> SafeLock<T> for std::sync::Mutex<T> {
    fn safe_lock(&self) -> HookResult<std::sync::MutexGuard<'_, T>> {
        self.lock().map_err(|_| HookError::MutexPoisoned {
            resource: "generic_mutex".to_string(),
        })
    }
}

/// Helper trait for safe RwLock read operations
pub trait SafeReadLock<T: ?Sized> {
    /// Safely acquire a read lock
    fn safe_read(&self) -> HookResult<std::sync::RwLockReadGuard<'_, T>>;
}

impl<T: ?Sized> SafeReadLock<T> for std::sync::RwLock<T> {
    fn safe_read(&self) -> HookResult<std::sync::RwLockReadGuard<'_, T>> {
        self.read().map_err(|_| HookError::MutexPoisoned {
            resource: "rwlock_read".to_string(),
        })
    }
}

/// Helper trait for safe RwLock write operations
pub trait SafeWriteLock<T: ?Sized> {
    /// Safely acquire a write lock
    fn safe_write(&self) -> HookResult<std::sync::RwLockWriteGuard<'_, T>>;
}

impl<T: ?Sized> SafeWriteLock<T> for std::sync::RwLock<T> {
    fn safe_write(&self) -> HookResult<std::sync::RwLockWriteGuard<'_, T>> {
        self.write().map_err(|_| HookError::MutexPoisoned {
            resource: "rwlock_write".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex, RwLock};

    #[test]
    fn test_error_creation() {
        let config_err = HookError::config("project_id must be set");
        assert!(config_err.to_string().contains("Configuration error"));

        let project_err = HookError::invalid_project("Bad_Project", "uppercase letters");
        assert_eq!(
            project_err.to_string(),
            "Invalid project identifier 'Bad_Project': uppercase letters"
        );

        let closed = HookError::sink_closed("error-sink");
        assert_eq!(closed.to_string(), "Sink closed: error-sink");

        let full = HookError::sink_full("log-sink");
        assert_eq!(full.to_string(), "Sink queue full: log-sink");
    }

    #[test]
    fn test_error_chaining() {
        use std::error::Error;

        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed");
        let hook_err = HookError::io("flushing log sink", io_err);

        assert!(hook_err.source().is_some());
        assert!(hook_err.to_string().contains("I/O operation failed"));
    }

    #[test]
    fn test_poisoned_lock_maps_to_error() {
        let lock = Arc::new(Mutex::new(0u32));
        let poisoner = Arc::clone(&lock);
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.lock();
            panic!("poison the lock");
        })
        .join();

        match lock.safe_lock() {
            Err(HookError::MutexPoisoned { resource }) => assert_eq!(resource, "generic_mutex"),
            other => panic!("expected MutexPoisoned, got {:?}", other.map(|g| *g)),
        };
    }

    #[test]
    fn test_rwlock_helpers_succeed_when_healthy() {
        let lock = RwLock::new(String::from("ok"));
        assert_eq!(lock.safe_read().unwrap().as_str(), "ok");
        lock.safe_write().unwrap().push('!');
        assert_eq!(lock.safe_read().unwrap().as_str(), "ok!");
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<HookError>();
    }
}
