//! Tracing helpers for tests.
//!
//! [`init_test_tracing`] sends events to the test harness so they show up
//! next to a failing test. [`capture_logs`] collects them into a buffer so a
//! test can assert on what the engine logged.

use std::io;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::subscriber::DefaultGuard;
use tracing_subscriber::EnvFilter;

/// Install a process-wide subscriber on the test writer. `RUST_LOG` wins
/// over the default `warn` filter. Repeated calls are ignored.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

/// Formatted log lines collected by [`capture_logs`].
#[derive(Debug, Clone, Default)]
pub struct LogCapture {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl LogCapture {
    pub fn contents(&self) -> String {
        let buf = self.buf.lock().unwrap_or_else(PoisonError::into_inner);
        String::from_utf8_lossy(&buf).into_owned()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.contents().contains(needle)
    }
}

impl io::Write for LogCapture {
    fn write(&mut self, bytes: &[u8]) -> io::Result<usize> {
        let mut buf = self.buf.lock().unwrap_or_else(PoisonError::into_inner);
        buf.extend_from_slice(bytes);
        Ok(bytes.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Capture events matching `filter` on the current thread until the guard
/// is dropped.
///
/// Work moved onto `spawn_blocking` runs on another thread and is not
/// captured, so assert only on events emitted from the test's own task.
///
/// ```ignore
/// #[tokio::test]
/// async fn logs_parse_failures() {
///     let (logs, _guard) = lmpctx_test_utils::capture_logs("warn");
///     // ... run the engine ...
///     assert!(logs.contains("error[config-parse]"));
/// }
/// ```
pub fn capture_logs(filter: &str) -> (LogCapture, DefaultGuard) {
    let capture = LogCapture::default();
    let writer = capture.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .without_time()
        .finish();
    (capture, tracing::subscriber::set_default(subscriber))
}
