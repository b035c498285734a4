use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering::SeqCst};
use crossbeam_channel::Sender;
use crate::Error;

/// Worker pool for one pipeline phase.
///
/// `producer` runs on the calling thread: it sends the phase's work items
/// (sources to extract, frame directories to encode), then collects results.
/// `consumer` runs on `num_threads` scoped threads named `{name}{n}`.
///
/// The first consumer error or panic makes the remaining workers skip their
/// queued items, and it is returned instead of the producer's result. That is
/// how a failed extraction ends the run.
pub fn new<P, C, M, R>(num_threads: usize, name: &str, producer: P, mut consumer: C) -> Result<R, Error> where
    M: Send,
    C: Clone + Send + FnMut(M) -> Result<(), Error>,
    P: FnOnce(Sender<M>) -> Result<R, Error>,
{
    let num_threads = num_threads.max(1);
    let failed = &AtomicBool::new(false);
    std::thread::scope(move |scope| {
        let (s, r) = crossbeam_channel::bounded(num_threads * 2);
        let thread = move || {
            catch_unwind(AssertUnwindSafe(move || {
                for m in r {
                    if failed.load(SeqCst) {
                        break;
                    }
                    if let Err(e) = consumer(m) {
                        failed.store(true, SeqCst);
                        return Err(e);
                    }
                }
                Ok(())
            })).map_err(move |_| {
                failed.store(true, SeqCst);
                Error::ThreadSend
            })?
        };
        let spawn = move |n, thread| {
            std::thread::Builder::new().name(format!("{name}{n}")).spawn_scoped(scope, thread).map_err(|_| {
                failed.store(true, SeqCst);
                Error::ThreadSend
            })
        };
        let mut handles = Vec::with_capacity(num_threads);
        for n in 0..num_threads - 1 {
            handles.push(spawn(n, thread.clone())?);
        }
        handles.push(spawn(num_threads - 1, thread)?);

        let res = producer(s).map_err(|e| {
            failed.store(true, SeqCst);
            e
        });
        handles.into_iter().try_for_each(|h| h.join().map_err(|_| Error::ThreadSend)?)?;
        res
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn every_message_is_consumed() {
        let seen = &AtomicUsize::new(0);
        let sent = new(3, "test", |s| {
            for n in 1..=10 {
                s.send(n)?;
            }
            Ok(10)
        }, move |n: usize| {
            seen.fetch_add(n, SeqCst);
            Ok(())
        }).unwrap();
        assert_eq!(sent, 10);
        assert_eq!(seen.load(SeqCst), 55);
    }

    #[test]
    fn consumer_error_wins() {
        let res: Result<(), _> = new(2, "test", |s| {
            for n in 0..100 {
                if s.send(n).is_err() {
                    break;
                }
            }
            Ok(())
        }, |n: u32| if n == 3 { Err(Error::Aborted) } else { Ok(()) });
        assert!(matches!(res, Err(Error::Aborted)));
    }
}
