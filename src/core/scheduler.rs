//! Cancellable periodic tasks.

use std::thread::{self, JoinHandle};
use std::time::Duration;

use flume::RecvTimeoutError;
use rand::Rng;
use tracing::trace;

use crate::Result;

/// Run `task` every `interval` (±10% jitter) on a thread named `name`,
/// until every sender of `shutdown` is dropped.
pub(crate) fn spawn_periodic<F>(
    name: &str,
    interval: Duration,
    shutdown: flume::Receiver<()>,
    task: F,
) -> Result<JoinHandle<()>>
where
    F: Fn() + Send + 'static,
{
    let handle = thread::Builder::new()
        .name(name.to_string())
        .spawn(move || loop {
            match shutdown.recv_timeout(jittered(interval)) {
                Err(RecvTimeoutError::Timeout) => task(),
                // Nothing is ever sent, any message also means stop.
                Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                    trace!(task = thread::current().name(), "Periodic task stopped");
                    break;
                }
            }
        })?;

    Ok(handle)
}

/// Spread rounds so nodes started together don't run in lockstep.
fn jittered(interval: Duration) -> Duration {
    interval.mul_f64(rand::thread_rng().gen_range(0.9..=1.1))
}

#[cfg(test)]
mod test {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;

    #[test]
    fn jitter_bounds() {
        let interval = Duration::from_millis(100);

        for _ in 0..100 {
            let jittered = jittered(interval);
            assert!(jittered >= Duration::from_millis(90));
            assert!(jittered <= Duration::from_millis(110));
        }
    }

    #[test]
    fn runs_until_shutdown() {
        let (tx, rx) = flume::bounded::<()>(1);
        let counter = Arc::new(AtomicUsize::new(0));

        let cloned = counter.clone();
        let handle = spawn_periodic("test-task", Duration::from_millis(1), rx, move || {
            cloned.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

        thread::sleep(Duration::from_millis(50));
        drop(tx);
        handle.join().unwrap();

        let runs = counter.load(Ordering::SeqCst);
        assert!(runs > 0);

        thread::sleep(Duration::from_millis(20));
        assert_eq!(counter.load(Ordering::SeqCst), runs);
    }
}
