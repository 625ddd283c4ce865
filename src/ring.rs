// Bounded lock-free MPSC ring buffer
//
// Producers claim tickets from a shared write counter; a per-slot sequence
// number carries the handshake between the producer generation that owns the
// slot and the single consumer. The protocol for ticket `t` at slot
// `i = t & mask`:
//
//   seq[i] == t       producer holding ticket `t` may write
//   seq[i] == t + 1   consumer may read
//   seq[i] == t + N   producer holding ticket `t + N` may write (next lap)
//
// The producer's release store of `seq[i] = t + 1` pairs with the consumer's
// acquire load before reading, making the payload visible. The consumer's
// release store of `seq[i] = t + N` pairs with the acquire in the spin of the
// next-lap producer, completing the handshake. Tickets are 64-bit on the
// platforms this targets, so counter wrap is not a practical concern.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Cacheline size the layout discipline is built around
pub const CACHE_LINE_SIZE: usize = 64;

/// Cache-aligned wrapper to prevent false sharing
#[repr(align(64))]
pub(crate) struct CacheAligned<T>(pub(crate) T);

/// Lock-free multiple-producer single-consumer ring buffer
///
/// `N` must be a power of two (checked at compile time) and `T` must occupy
/// whole cachelines so neighboring slots never share a line. `T: Copy` keeps
/// slot transfer a plain memory copy with no drop obligations.
pub struct Ring<T, const N: usize> {
    write_counter: CacheAligned<AtomicUsize>,
    read_counter: CacheAligned<AtomicUsize>,
    slots: Box<[UnsafeCell<T>]>,
    seq: Box<[CacheAligned<AtomicUsize>]>,
}

// SAFETY: Ring is Sync because:
// - Producers coordinate through distinct tickets from write_counter; two
//   producers never hold the same unreleased ticket, so slot writes are
//   disjoint.
// - Only one thread pops (guaranteed by the drain worker architecture).
// - The sequence handshake orders every slot access between the owning
//   producer and the consumer.
unsafe impl<T: Send + Copy, const N: usize> Sync for Ring<T, N> {}

impl<T: Copy + Default, const N: usize> Ring<T, N> {
    const MASK: usize = N - 1;

    /// Create an empty ring. Sequence numbers start at their slot index, so
    /// the first `N` tickets are admitted without waiting.
    pub fn new() -> Self {
        const {
            assert!(N.is_power_of_two(), "ring capacity must be a power of two");
            assert!(
                std::mem::size_of::<T>() % CACHE_LINE_SIZE == 0,
                "slot type must occupy whole cachelines"
            );
        }

        let slots: Vec<UnsafeCell<T>> = (0..N).map(|_| UnsafeCell::new(T::default())).collect();
        let seq: Vec<CacheAligned<AtomicUsize>> =
            (0..N).map(|i| CacheAligned(AtomicUsize::new(i))).collect();

        Self {
            write_counter: CacheAligned(AtomicUsize::new(0)),
            read_counter: CacheAligned(AtomicUsize::new(0)),
            slots: slots.into_boxed_slice(),
            seq: seq.into_boxed_slice(),
        }
    }

    /// Push a value, spinning while the ring is full.
    ///
    /// Safe to call from any number of threads. Each caller claims a unique
    /// ticket up front, so admissions complete in strict ticket order; when
    /// the ring is full the producer busy-waits (with spin relief) until the
    /// consumer releases the slot it is about to reuse.
    pub fn push(&self, value: T) {
        // Reserve a ticket (no contention beyond the fetch_add itself)
        let ticket = self.write_counter.0.fetch_add(1, Ordering::Relaxed);
        let idx = ticket & Self::MASK;

        // Admission gate: wait until the consumer has released this slot's
        // previous generation.
        while self.seq[idx].0.load(Ordering::Acquire) != ticket {
            std::hint::spin_loop();
        }

        // SAFETY: seq[idx] == ticket means this producer exclusively owns
        // the slot until it publishes ticket + 1.
        unsafe {
            *self.slots[idx].get() = value;
        }

        // Publish the payload to the consumer
        self.seq[idx].0.store(ticket.wrapping_add(1), Ordering::Release);
    }

    /// Push a value only if a slot is free, returning `false` when the ring
    /// is full.
    ///
    /// Unlike `push`, the ticket is claimed with a compare-exchange after the
    /// head slot's sequence has been observed free, so a full ring never
    /// blocks the caller.
    pub fn try_push(&self, value: T) -> bool {
        let mut ticket = self.write_counter.0.load(Ordering::Relaxed);
        loop {
            let idx = ticket & Self::MASK;
            let seq = self.seq[idx].0.load(Ordering::Acquire);
            let dif = (seq as isize).wrapping_sub(ticket as isize);

            if dif == 0 {
                match self.write_counter.0.compare_exchange_weak(
                    ticket,
                    ticket.wrapping_add(1),
                    Ordering::Relaxed,
                    Ordering::Relaxed,
                ) {
                    Ok(_) => {
                        // SAFETY: the successful CAS makes this producer the
                        // exclusive owner of `ticket`.
                        unsafe {
                            *self.slots[idx].get() = value;
                        }
                        self.seq[idx].0.store(ticket.wrapping_add(1), Ordering::Release);
                        return true;
                    }
                    Err(current) => {
                        ticket = current;
                        std::hint::spin_loop();
                    }
                }
            } else if dif < 0 {
                // Slot still held by the previous generation: ring is full
                return false;
            } else {
                // Another producer advanced past us; re-read the counter
                ticket = self.write_counter.0.load(Ordering::Relaxed);
            }
        }
    }

    /// Pop the oldest value into `out`, returning `false` when nothing is
    /// ready.
    ///
    /// Must only be called from a single consumer thread.
    pub fn try_pop(&self, out: &mut T) -> bool {
        // Relaxed is enough: the consumer is the only writer of read_counter
        let ticket = self.read_counter.0.load(Ordering::Relaxed);
        let idx = ticket & Self::MASK;

        if self.seq[idx].0.load(Ordering::Acquire) != ticket.wrapping_add(1) {
            // Empty, or a producer reserved the slot but has not published
            return false;
        }

        // SAFETY: seq[idx] == ticket + 1 guarantees the producer's write is
        // complete and visible (acquire above pairs with its release).
        unsafe {
            *out = *self.slots[idx].get();
        }

        // Release the slot to the producer that will claim ticket + N
        self.seq[idx].0.store(ticket.wrapping_add(N), Ordering::Release);
        self.read_counter.0.store(ticket.wrapping_add(1), Ordering::Release);
        true
    }

    /// Number of records currently queued
    pub fn len(&self) -> usize {
        let write = self.write_counter.0.load(Ordering::Relaxed);
        let read = self.read_counter.0.load(Ordering::Relaxed);
        write.saturating_sub(read)
    }

    /// Check if the ring is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Capacity in slots
    pub const fn capacity(&self) -> usize {
        N
    }

    #[cfg(test)]
    pub(crate) fn counter_addresses(&self) -> (usize, usize) {
        (
            &self.write_counter.0 as *const AtomicUsize as usize,
            &self.read_counter.0 as *const AtomicUsize as usize,
        )
    }
}

impl<T: Copy + Default, const N: usize> Default for Ring<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use std::sync::{mpsc, Arc};
    use std::thread;
    use std::time::Duration;

    // Padded payload so the whole-cacheline requirement holds for tests
    #[repr(C, align(64))]
    #[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
    struct Cell(u64);

    #[test]
    fn test_basic_push_pop() {
        let ring: Ring<Cell, 4> = Ring::new();
        ring.push(Cell(1));
        ring.push(Cell(2));
        assert_eq!(ring.len(), 2);

        let mut out = Cell::default();
        assert!(ring.try_pop(&mut out));
        assert_eq!(out, Cell(1));
        assert!(ring.try_pop(&mut out));
        assert_eq!(out, Cell(2));
        assert!(!ring.try_pop(&mut out));
        assert!(ring.is_empty());
    }

    #[test]
    fn test_fill_then_drain() {
        // Filling to exactly N then reading all drains cleanly
        let ring: Ring<Cell, 8> = Ring::new();
        for i in 0..8 {
            ring.push(Cell(i));
        }
        assert_eq!(ring.len(), 8);

        let mut out = Cell::default();
        for i in 0..8 {
            assert!(ring.try_pop(&mut out));
            assert_eq!(out, Cell(i));
        }
        assert!(!ring.try_pop(&mut out));
    }

    #[test]
    fn test_wraparound() {
        let ring: Ring<Cell, 4> = Ring::new();
        let mut out = Cell::default();
        // Cycle through several laps
        for lap in 0..5u64 {
            for i in 0..4 {
                ring.push(Cell(lap * 4 + i));
            }
            for i in 0..4 {
                assert!(ring.try_pop(&mut out));
                assert_eq!(out, Cell(lap * 4 + i));
            }
        }
    }

    #[test]
    fn test_try_push_full() {
        let ring: Ring<Cell, 4> = Ring::new();
        for i in 0..4 {
            assert!(ring.try_push(Cell(i)));
        }
        assert!(!ring.try_push(Cell(99)));

        let mut out = Cell::default();
        assert!(ring.try_pop(&mut out));
        assert_eq!(out, Cell(0));

        // One slot freed, one admission succeeds
        assert!(ring.try_push(Cell(4)));
        assert!(!ring.try_push(Cell(100)));
    }

    #[test]
    fn test_push_blocks_when_full() {
        // The (N+1)th push spins until the consumer releases a slot
        let ring: Arc<Ring<Cell, 8>> = Arc::new(Ring::new());
        for i in 0..8 {
            ring.push(Cell(i));
        }

        let unblocked = Arc::new(AtomicBool::new(false));
        let (tx, rx) = mpsc::channel();
        let producer = {
            let ring = Arc::clone(&ring);
            let unblocked = Arc::clone(&unblocked);
            thread::spawn(move || {
                ring.push(Cell(8));
                unblocked.store(true, Ordering::SeqCst);
                tx.send(()).unwrap();
            })
        };

        // Still blocked while the ring is full
        thread::sleep(Duration::from_millis(50));
        assert!(!unblocked.load(Ordering::SeqCst));

        // Releasing one slot admits exactly the blocked producer
        let mut out = Cell::default();
        assert!(ring.try_pop(&mut out));
        assert_eq!(out, Cell(0));
        rx.recv_timeout(Duration::from_secs(5)).unwrap();
        producer.join().unwrap();

        // All remaining records drain in ticket order
        for i in 1..9 {
            assert!(ring.try_pop(&mut out));
            assert_eq!(out, Cell(i));
        }
        assert!(ring.is_empty());
    }

    #[test]
    fn test_concurrent_producers_conserve_records() {
        const PRODUCERS: u64 = 4;
        const PER_PRODUCER: u64 = 1000;
        let ring: Arc<Ring<Cell, 64>> = Arc::new(Ring::new());

        let consumer = {
            let ring = Arc::clone(&ring);
            thread::spawn(move || {
                let mut seen = Vec::with_capacity((PRODUCERS * PER_PRODUCER) as usize);
                let mut out = Cell::default();
                while seen.len() < (PRODUCERS * PER_PRODUCER) as usize {
                    if ring.try_pop(&mut out) {
                        seen.push(out.0);
                    } else {
                        std::hint::spin_loop();
                    }
                }
                seen
            })
        };

        let producers: Vec<_> = (0..PRODUCERS)
            .map(|p| {
                let ring = Arc::clone(&ring);
                thread::spawn(move || {
                    for i in 0..PER_PRODUCER {
                        ring.push(Cell(p * PER_PRODUCER + i));
                    }
                })
            })
            .collect();
        for handle in producers {
            handle.join().unwrap();
        }

        let mut seen = consumer.join().unwrap();

        // No duplication, no loss
        seen.sort_unstable();
        let expected: Vec<u64> = (0..PRODUCERS * PER_PRODUCER).collect();
        assert_eq!(seen, expected);
    }

    #[test]
    fn test_per_producer_fifo() {
        const PRODUCERS: u64 = 3;
        const PER_PRODUCER: u64 = 2000;
        let ring: Arc<Ring<Cell, 16>> = Arc::new(Ring::new());

        let consumer = {
            let ring = Arc::clone(&ring);
            thread::spawn(move || {
                let mut last = vec![None::<u64>; PRODUCERS as usize];
                let mut total = 0;
                let mut out = Cell::default();
                while total < PRODUCERS * PER_PRODUCER {
                    if !ring.try_pop(&mut out) {
                        std::hint::spin_loop();
                        continue;
                    }
                    let producer = (out.0 >> 32) as usize;
                    let sequence = out.0 & 0xffff_ffff;
                    if let Some(prev) = last[producer] {
                        assert!(sequence > prev, "producer {producer} reordered");
                    }
                    last[producer] = Some(sequence);
                    total += 1;
                }
            })
        };

        let producers: Vec<_> = (0..PRODUCERS)
            .map(|p| {
                let ring = Arc::clone(&ring);
                thread::spawn(move || {
                    for i in 0..PER_PRODUCER {
                        ring.push(Cell((p << 32) | i));
                    }
                })
            })
            .collect();
        for handle in producers {
            handle.join().unwrap();
        }
        consumer.join().unwrap();
    }

    #[test]
    fn test_counter_cacheline_isolation() {
        let ring: Ring<Cell, 4> = Ring::new();
        let (write_addr, read_addr) = ring.counter_addresses();
        assert!(
            write_addr.abs_diff(read_addr) >= CACHE_LINE_SIZE,
            "write and read counters share a cacheline"
        );
    }
}
