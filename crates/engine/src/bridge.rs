//! Blocking-producer to async-stream hand-off.
//!
//! The crawl and anything else doing synchronous I/O runs on the blocking
//! thread pool; its output is republished on the caller's context as an
//! awaitable sequence. A tagged terminal signal keeps "done" and "failed"
//! out of the data domain.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Hand-off queue depth; the producer blocks once the consumer falls this
/// far behind.
const CHANNEL_CAPACITY: usize = 32;

enum Signal<T, E> {
    Item(T),
    Done,
    Failed(E),
}

/// Consumer half of [`run_streaming`].
///
/// Items arrive in production order; the terminal outcome is only observable
/// after every preceding item has been consumed. Dropping the stream early is
/// cooperative cancellation: the worker keeps running to completion, its
/// remaining output discarded, it is never forcibly interrupted.
pub struct BlockingStream<T, E> {
    rx: mpsc::Receiver<Signal<T, E>>,
    worker: Option<JoinHandle<()>>,
    finished: bool,
}

impl<T, E> BlockingStream<T, E> {
    /// Next item, `Some(Err(_))` for the producer's terminal error, `None`
    /// once the stream is exhausted.
    pub async fn next(&mut self) -> Option<Result<T, E>> {
        if self.finished {
            return None;
        }
        match self.rx.recv().await {
            Some(Signal::Item(item)) => Some(Ok(item)),
            Some(Signal::Done) => {
                self.finish().await;
                None
            }
            Some(Signal::Failed(error)) => {
                self.finish().await;
                Some(Err(error))
            }
            // The worker can only vanish without a terminal signal if it
            // panicked; surface that as end-of-stream after joining.
            None => {
                self.finish().await;
                None
            }
        }
    }

    /// Join the worker so no background work outlives the stream's end.
    async fn finish(&mut self) {
        self.finished = true;
        if let Some(worker) = self.worker.take() {
            if let Err(e) = worker.await {
                tracing::error!("Bridge worker task failed: {}", e);
            }
        }
    }
}

/// Run a blocking producer on the worker pool, streaming its output.
///
/// The producer is an iterator of `Result<T, E>`; its first `Err` terminates
/// production and is delivered to the consumer after all preceding items.
pub fn run_streaming<T, E, I, F>(producer: F) -> BlockingStream<T, E>
where
    F: FnOnce() -> I + Send + 'static,
    I: IntoIterator<Item = Result<T, E>>,
    T: Send + 'static,
    E: Send + 'static,
{
    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);

    let worker = tokio::task::spawn_blocking(move || {
        let mut terminal: Option<Signal<T, E>> = None;
        // Once the consumer hangs up there is nobody to deliver to, but the
        // producer still runs to completion (cooperative cancellation).
        let mut hung_up = false;

        for next in producer() {
            match next {
                Ok(item) => {
                    if !hung_up && tx.blocking_send(Signal::Item(item)).is_err() {
                        hung_up = true;
                    }
                }
                Err(error) => {
                    terminal = Some(Signal::Failed(error));
                    break;
                }
            }
        }

        if !hung_up {
            let _ = tx.blocking_send(terminal.unwrap_or(Signal::Done));
        }
    });

    BlockingStream {
        rx,
        worker: Some(worker),
        finished: false,
    }
}

/// Degenerate non-streaming form: run one blocking call to completion and
/// return its value. Worker panics are resumed on the caller.
pub async fn run_once<F, R>(f: F) -> R
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(value) => value,
        Err(e) => match e.try_into_panic() {
            Ok(payload) => std::panic::resume_unwind(payload),
            Err(e) => panic!("blocking task cancelled: {e}"),
        },
    }
}
