//! Process-wide shared I/O runtime
//!
//! All client connections run their socket and codec state on one
//! lazily created single-worker tokio runtime, which also provides the
//! timer wheel backing connect and request timeouts. The runtime is
//! created on first use and torn down through
//! [`release_shared_resources`]; a client created afterwards transparently
//! recreates it.

use crate::error::{AdsError, AdsResult};
use std::sync::{Mutex, OnceLock};
use std::time::Duration;
use tokio::runtime::{Builder, Handle, Runtime};

static SHARED_RUNTIME: OnceLock<Mutex<Option<Runtime>>> = OnceLock::new();

fn slot() -> &'static Mutex<Option<Runtime>> {
    SHARED_RUNTIME.get_or_init(|| Mutex::new(None))
}

/// Handle of the shared I/O worker, creating it on first use
pub(crate) fn io_handle() -> AdsResult<Handle> {
    let mut guard = slot().lock().expect("shared runtime lock poisoned");
    if guard.is_none() {
        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("ads-io")
            .enable_all()
            .build()
            .map_err(AdsError::Connection)?;
        *guard = Some(runtime);
    }
    Ok(guard
        .as_ref()
        .expect("runtime initialized above")
        .handle()
        .clone())
}

/// Shut down the shared I/O worker and timer
///
/// Blocks up to `timeout` for running tasks to finish. Safe to call when
/// no runtime was ever created.
pub fn release_shared_resources(timeout: Duration) {
    let runtime = slot()
        .lock()
        .expect("shared runtime lock poisoned")
        .take();
    if let Some(runtime) = runtime {
        runtime.shutdown_timeout(timeout);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_is_lazily_created() {
        let handle = io_handle().unwrap();
        let value = handle.block_on(async { 21 * 2 });
        assert_eq!(value, 42);

        // a second call reuses the same runtime
        let handle = io_handle().unwrap();
        let value = handle.block_on(async { 1 });
        assert_eq!(value, 1);
    }

    #[test]
    #[ignore = "tears down the process-wide runtime shared with other tests"]
    fn test_release_and_recreate() {
        let handle = io_handle().unwrap();
        handle.block_on(async {});

        release_shared_resources(Duration::from_secs(1));

        // a new runtime is created transparently afterwards
        let handle = io_handle().unwrap();
        handle.block_on(async {});
    }
}
