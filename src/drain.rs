// Drain worker - pops slots from the ring and writes batched output
//
// Single dedicated thread. Each iteration pops up to `batch_write` slots,
// formats each into a reusable byte buffer, and hands the whole batch to the
// sink in one vectored write. Sink errors never reach producers; hard errors
// drop the batch and advance a counter.

use crate::format::{render_record, HEADER_MAX};
use crate::logger::Core;
use crate::sink::Sink;
use crate::slot::{Slot, MSG_MAX};
use std::io::{self, IoSlice};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Idle backoff when the ring is empty and the logger is still running
const IDLE_SLEEP: Duration = Duration::from_micros(50);

pub(crate) struct DrainLoop<S: Sink, const N: usize> {
    core: Arc<Core<N>>,
    sink: S,
    batch: usize,
    /// One formatting buffer per batch position, reused across iterations.
    /// The IoSlice descriptor list is rebuilt per batch because it borrows
    /// these buffers; the buffers themselves never reallocate in steady
    /// state.
    bufs: Vec<Vec<u8>>,
}

impl<S: Sink, const N: usize> DrainLoop<S, N> {
    pub(crate) fn new(core: Arc<Core<N>>, sink: S, batch: usize) -> Self {
        let bufs = (0..batch)
            .map(|_| Vec::with_capacity(MSG_MAX + HEADER_MAX))
            .collect();
        Self {
            core,
            sink,
            batch,
            bufs,
        }
    }

    /// Run until the stop flag is observed AND a pop pass comes up empty.
    ///
    /// The empty-pass condition is what makes shutdown lossless: a stop
    /// signal observed mid-stream only takes effect once everything pushed
    /// before it has been written.
    pub(crate) fn run(mut self) {
        let mut scratch = Slot::default();
        loop {
            let count = self.fill_batch(&mut scratch);
            if count > 0 {
                self.flush_batch(count);
            } else if !self.core.running.load(Ordering::Relaxed) {
                break;
            } else {
                thread::sleep(IDLE_SLEEP);
            }
        }
    }

    /// Pop and format up to `batch` records, returning how many were taken.
    fn fill_batch(&mut self, scratch: &mut Slot) -> usize {
        let mut count = 0;
        while count < self.batch {
            if !self.core.ring.try_pop(scratch) {
                break;
            }
            let buf = &mut self.bufs[count];
            buf.clear();
            render_record(scratch, buf);
            count += 1;
        }
        count
    }

    /// Write the first `count` buffers with one vectored call, re-issuing
    /// the unwritten tail after partial writes. EINTR retries immediately;
    /// EAGAIN yields first. Any other error abandons the batch.
    fn flush_batch(&mut self, count: usize) {
        let mut first = 0;
        let mut skip = 0;
        while first < count {
            let iov: Vec<IoSlice<'_>> = self.bufs[first..count]
                .iter()
                .enumerate()
                .map(|(i, buf)| {
                    if i == 0 {
                        IoSlice::new(&buf[skip..])
                    } else {
                        IoSlice::new(buf)
                    }
                })
                .collect();

            match self.sink.writev(&iov) {
                Ok(0) => {
                    // Sink accepts nothing; treat like a hard error
                    self.core.io_errors.fetch_add(1, Ordering::Relaxed);
                    return;
                }
                Ok(mut written) => {
                    while first < count {
                        let remaining = self.bufs[first].len() - skip;
                        if written >= remaining {
                            written -= remaining;
                            first += 1;
                            skip = 0;
                        } else {
                            skip += written;
                            break;
                        }
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    thread::yield_now();
                }
                Err(_) => {
                    // Best-effort pipeline: drop the batch, keep draining
                    self.core.io_errors.fetch_add(1, Ordering::Relaxed);
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::WallTime;
    use crate::config::LogConfig;
    use crate::severity::Severity;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    const N: usize = 16;

    fn test_core(running: bool) -> Arc<Core<N>> {
        let core = Core::new(LogConfig::new("stdout"));
        core.running.store(running, Ordering::Relaxed);
        Arc::new(core)
    }

    fn push_record(core: &Core<N>, text: &str) {
        let mut slot = Slot::new(Severity::Info, WallTime { sec: 0, nsec: 0 });
        slot.render(format_args!("{}", text));
        core.ring.push(slot);
    }

    /// Sink capturing bytes, optionally limiting bytes-per-call and
    /// injecting errors for the first calls.
    struct TestSink {
        written: Arc<Mutex<Vec<u8>>>,
        calls: Arc<AtomicUsize>,
        max_per_call: usize,
        fail_first: Option<io::ErrorKind>,
    }

    impl TestSink {
        fn new() -> (Self, Arc<Mutex<Vec<u8>>>, Arc<AtomicUsize>) {
            let written = Arc::new(Mutex::new(Vec::new()));
            let calls = Arc::new(AtomicUsize::new(0));
            (
                Self {
                    written: Arc::clone(&written),
                    calls: Arc::clone(&calls),
                    max_per_call: usize::MAX,
                    fail_first: None,
                },
                written,
                calls,
            )
        }
    }

    impl Sink for TestSink {
        fn writev(&mut self, bufs: &[IoSlice<'_>]) -> io::Result<usize> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call == 0 {
                if let Some(kind) = self.fail_first {
                    return Err(io::Error::from(kind));
                }
            }
            let mut budget = self.max_per_call;
            let mut out = self.written.lock().unwrap();
            let mut total = 0;
            for buf in bufs {
                let take = buf.len().min(budget);
                out.extend_from_slice(&buf[..take]);
                total += take;
                budget -= take;
                if budget == 0 {
                    break;
                }
            }
            Ok(total)
        }
    }

    #[test]
    fn test_drains_everything_then_exits() {
        let core = test_core(false);
        for i in 0..5 {
            push_record(&core, &format!("record {i}\n"));
        }
        let (sink, written, _) = TestSink::new();
        // running is already false: the loop must still drain the backlog
        DrainLoop::new(Arc::clone(&core), sink, 3).run();

        let text = String::from_utf8(written.lock().unwrap().clone()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 5);
        for (i, line) in lines.iter().enumerate() {
            assert!(line.ends_with(&format!("record {i}")), "line {i}: {line}");
        }
        assert!(core.ring.is_empty());
        assert_eq!(core.io_errors.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_records_contiguous_in_pop_order() {
        let core = test_core(false);
        push_record(&core, "aa");
        push_record(&core, "bb");
        let (sink, written, _) = TestSink::new();
        DrainLoop::new(Arc::clone(&core), sink, 8).run();

        let bytes = written.lock().unwrap().clone();
        let text = String::from_utf8(bytes).unwrap();
        let a = text.find("aa").unwrap();
        let b = text.find("bb").unwrap();
        assert!(a < b);
        // No separator is inserted between records: the second header starts
        // immediately after the first body
        assert_eq!(a + 2 + HEADER_MAX, b);
    }

    #[test]
    fn test_partial_writes_are_resumed() {
        let core = test_core(false);
        for i in 0..4 {
            push_record(&core, &format!("partial {i}\n"));
        }
        let (mut sink, written, calls) = TestSink::new();
        sink.max_per_call = 7;
        DrainLoop::new(Arc::clone(&core), sink, 4).run();

        let text = String::from_utf8(written.lock().unwrap().clone()).unwrap();
        assert_eq!(text.lines().count(), 4);
        for i in 0..4 {
            assert!(text.contains(&format!("partial {i}")));
        }
        assert!(calls.load(Ordering::SeqCst) > 4);
        assert_eq!(core.io_errors.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_eintr_is_retried() {
        let core = test_core(false);
        push_record(&core, "interrupted\n");
        let (mut sink, written, _) = TestSink::new();
        sink.fail_first = Some(io::ErrorKind::Interrupted);
        DrainLoop::new(Arc::clone(&core), sink, 4).run();

        let text = String::from_utf8(written.lock().unwrap().clone()).unwrap();
        assert!(text.contains("interrupted"));
        assert_eq!(core.io_errors.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_eagain_is_retried_after_yield() {
        let core = test_core(false);
        push_record(&core, "blocked once\n");
        let (mut sink, written, _) = TestSink::new();
        sink.fail_first = Some(io::ErrorKind::WouldBlock);
        DrainLoop::new(Arc::clone(&core), sink, 4).run();

        let text = String::from_utf8(written.lock().unwrap().clone()).unwrap();
        assert!(text.contains("blocked once"));
        assert_eq!(core.io_errors.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_hard_error_drops_batch_and_counts() {
        struct FailingSink;
        impl Sink for FailingSink {
            fn writev(&mut self, _bufs: &[IoSlice<'_>]) -> io::Result<usize> {
                Err(io::Error::from(io::ErrorKind::PermissionDenied))
            }
        }

        let core = test_core(false);
        for i in 0..3 {
            push_record(&core, &format!("lost {i}"));
        }
        DrainLoop::new(Arc::clone(&core), FailingSink, 2).run();

        // 3 records, batch of 2: two batches attempted, both dropped
        assert_eq!(core.io_errors.load(Ordering::Relaxed), 2);
        assert!(core.ring.is_empty());
    }
}
