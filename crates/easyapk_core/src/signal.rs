use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

/// A one-shot "skip" request for a single device queue.
///
/// Arming it is idempotent; exactly one consumer clears it, either the job that
/// is running when it fires or, if none is running, the next job to start.
#[derive(Debug, Default)]
pub struct SkipSignal {
    armed: AtomicBool,
    notify: Notify,
}

impl SkipSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.armed.store(true, Ordering::SeqCst);
        self.notify.notify_one();
    }

    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::SeqCst)
    }

    /// Consumes a pending request.
    pub fn take(&self) -> bool {
        self.armed.swap(false, Ordering::SeqCst)
    }

    /// Resolves once a request is consumed. Stale wakeups left by a request that
    /// was already taken are ignored.
    pub async fn triggered(&self) {
        loop {
            if self.take() {
                return;
            }
            self.notify.notified().await;
        }
    }
}

/// What an in-flight install listens to: its device's skip signal and the
/// batch-wide cancellation.
#[derive(Debug, Clone)]
pub struct Interrupt {
    skip: Arc<SkipSignal>,
    cancel: CancellationToken,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interruption {
    Skipped,
    Cancelled,
}

impl Interrupt {
    pub fn new(skip: Arc<SkipSignal>, cancel: CancellationToken) -> Self {
        Self { skip, cancel }
    }

    /// An interrupt nobody holds a handle to; it never fires.
    pub fn never() -> Self {
        Self::new(Arc::new(SkipSignal::new()), CancellationToken::new())
    }

    pub async fn fired(&self) -> Interruption {
        tokio::select! {
            _ = self.cancel.cancelled() => Interruption::Cancelled,
            _ = self.skip.triggered() => Interruption::Skipped,
        }
    }
}

/// Cloneable handle front-ends use to steer a running batch.
#[derive(Debug, Clone)]
pub struct BatchControl {
    inner: Arc<ControlInner>,
}

#[derive(Debug)]
struct ControlInner {
    cancel: CancellationToken,
    skips: DashMap<String, Arc<SkipSignal>>,
}

impl BatchControl {
    pub fn new<'a>(serials: impl IntoIterator<Item = &'a str>) -> Self {
        let skips = DashMap::new();
        for serial in serials {
            skips.insert(serial.to_string(), Arc::new(SkipSignal::new()));
        }
        Self {
            inner: Arc::new(ControlInner {
                cancel: CancellationToken::new(),
                skips,
            }),
        }
    }

    /// Skips the job running on `serial` (or its next job). False for a serial
    /// that is not part of the batch.
    pub fn skip_current(&self, serial: &str) -> bool {
        match self.inner.skips.get(serial) {
            Some(signal) => {
                signal.request();
                true
            }
            None => false,
        }
    }

    pub fn skip_current_all(&self) {
        for entry in self.inner.skips.iter() {
            entry.value().request();
        }
    }

    pub fn cancel_all(&self) {
        self.inner.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancel.is_cancelled()
    }

    pub(crate) fn interrupt_for(&self, serial: &str) -> Interrupt {
        let skip = self
            .inner
            .skips
            .entry(serial.to_string())
            .or_insert_with(|| Arc::new(SkipSignal::new()))
            .clone();
        Interrupt::new(skip, self.inner.cancel.clone())
    }

    pub(crate) fn skip_signal(&self, serial: &str) -> Arc<SkipSignal> {
        self.interrupt_for(serial).skip
    }
}
