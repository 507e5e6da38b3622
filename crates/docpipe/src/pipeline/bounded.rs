use std::time::Duration;

use crossbeam_channel::RecvTimeoutError;

use super::error::PipelineError;

/// Runs `f` on its own thread and waits at most `timeout` for it.
///
/// On timeout the call is abandoned, not cancelled: it may still finish
/// later. Callers rely on conditional writes to make that harmless.
pub fn run_bounded<T, F>(
    operation: &'static str,
    timeout: Duration,
    f: F,
) -> Result<T, PipelineError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, PipelineError> + Send + 'static,
{
    let (tx, rx) = crossbeam_channel::bounded(1);

    std::thread::Builder::new()
        .name(format!("bounded-{}", operation))
        .spawn(move || {
            // Receiver is gone when the caller already timed out.
            let _ = tx.send(f());
        })
        .map_err(|e| PipelineError::SpawnFailed(e.to_string()))?;

    match rx.recv_timeout(timeout) {
        Ok(result) => result,
        Err(RecvTimeoutError::Timeout) => {
            tracing::warn!(operation, timeout_ms = timeout.as_millis() as u64, "Call timed out");
            Err(PipelineError::Timeout { operation, timeout })
        }
        Err(RecvTimeoutError::Disconnected) => Err(PipelineError::Aborted { operation }),
    }
}
