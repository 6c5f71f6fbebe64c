use std::panic::AssertUnwindSafe;
use std::sync::Arc;

/// One coarse progress checkpoint emitted during a generation call (spec
/// section 4.5's progress table: 10% context, 40% local start, 90% success,
/// ...).
#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub progress: u8,
    pub message: String,
}

pub type ProgressCallback = Arc<dyn Fn(ProgressEvent) + Send + Sync>;

/// Invoke `callback` with `(progress, message)`, swallowing any panic inside
/// it. Progress callbacks are best-effort: exceptions
/// inside callbacks MUST NOT fail generation."
pub fn emit_progress(callback: Option<&ProgressCallback>, progress: u8, message: impl Into<String>) {
    let Some(callback) = callback else { return };
    let event = ProgressEvent {
        progress,
        message: message.into(),
    };
    let callback = callback.clone();
    let result = std::panic::catch_unwind(AssertUnwindSafe(|| callback(event)));
    if result.is_err() {
        tracing::warn!("progress callback panicked; ignoring");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU8, Ordering};

    #[test]
    fn delivers_progress_to_callback() {
        let seen = Arc::new(AtomicU8::new(0));
        let seen2 = seen.clone();
        let callback: ProgressCallback = Arc::new(move |event| seen2.store(event.progress, Ordering::SeqCst));
        emit_progress(Some(&callback), 42, "halfway");
        assert_eq!(seen.load(Ordering::SeqCst), 42);
    }

    #[test]
    fn panicking_callback_does_not_propagate() {
        let callback: ProgressCallback = Arc::new(|_event| panic!("boom"));
        emit_progress(Some(&callback), 10, "oops");
    }

    #[test]
    fn missing_callback_is_a_no_op() {
        emit_progress(None, 10, "ignored");
    }
}
