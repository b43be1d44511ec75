//! Round-robin selection with health and circuit failover.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::health::HealthRecord;
use crate::resilience::CircuitBreaker;

/// Round-robin selector.
/// Stores the shared rotation cursor; everything else is read per call.
#[derive(Debug)]
pub struct Selector {
    cursor: AtomicUsize,
    backend_count: NonZeroUsize,
}

impl Selector {
    pub fn new(backend_count: NonZeroUsize) -> Self {
        Self {
            cursor: AtomicUsize::new(0),
            backend_count,
        }
    }

    pub fn backend_count(&self) -> usize {
        self.backend_count.get()
    }

    /// Pick the backend for one request. Never fails and never does I/O.
    ///
    /// Scans from the cursor position for the first backend that is both
    /// probe-healthy and admitted by its circuit breaker. When the winner
    /// sits past skipped slots the cursor is advanced over them too. This
    /// departs from a plain step-1 cursor: skipping changes the step size so
    /// the traffic of an ineligible backend spreads over all eligible ones
    /// instead of landing on its cyclic successor (150/0/150 rather than
    /// 100/0/200 with the middle of three backends down). With nothing
    /// eligible the cursor position itself is returned (fail-open).
    ///
    /// `breakers` must hold one breaker per backend.
    pub fn pick(&self, health: &HealthRecord, breakers: &[CircuitBreaker]) -> usize {
        let len = self.backend_count.get();
        debug_assert_eq!(breakers.len(), len);

        let next = self.cursor.fetch_add(1, Ordering::Relaxed);

        for offset in 0..len {
            let candidate = next.wrapping_add(offset) % len;
            if !health.is_healthy(candidate) {
                continue;
            }
            // Checked last: can_attempt may move an open breaker to half-open.
            if !breakers[candidate].can_attempt() {
                continue;
            }
            if offset > 0 {
                self.cursor.fetch_add(offset, Ordering::Relaxed);
            }
            return candidate;
        }

        next % len
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    struct Fixture {
        selector: Selector,
        health: HealthRecord,
        breakers: Vec<CircuitBreaker>,
    }

    impl Fixture {
        fn new(count: usize, failure_threshold: u32) -> Self {
            Self {
                selector: Selector::new(NonZeroUsize::new(count).unwrap()),
                health: HealthRecord::new(count),
                breakers: (0..count)
                    .map(|i| {
                        CircuitBreaker::new(
                            format!("http://b{i}:8080"),
                            failure_threshold,
                            Duration::from_secs(10),
                        )
                    })
                    .collect(),
            }
        }

        fn pick(&self) -> usize {
            self.selector.pick(&self.health, &self.breakers)
        }

        fn counts(&self, requests: usize) -> Vec<usize> {
            let mut counts = vec![0; self.breakers.len()];
            for _ in 0..requests {
                counts[self.pick()] += 1;
            }
            counts
        }
    }

    #[test]
    fn test_round_robin_order() {
        let f = Fixture::new(3, 5);
        let picks: Vec<_> = (0..6).map(|_| f.pick()).collect();
        assert_eq!(picks, vec![0, 1, 2, 0, 1, 2]);
    }

    #[test]
    fn test_even_distribution() {
        let f = Fixture::new(3, 5);
        for count in f.counts(300) {
            assert!((90..=110).contains(&count), "got {count}");
        }
    }

    #[test]
    fn test_unhealthy_backend_skipped_and_share_split() {
        let f = Fixture::new(3, 5);
        f.health.set_healthy(1, false);

        let counts = f.counts(300);
        assert_eq!(counts[1], 0);
        assert!((140..=160).contains(&counts[0]), "backend 0 got {}", counts[0]);
        assert!((140..=160).contains(&counts[2]), "backend 2 got {}", counts[2]);
    }

    #[test]
    fn test_adjacent_unhealthy_backends_still_uniform() {
        let f = Fixture::new(5, 5);
        f.health.set_healthy(1, false);
        f.health.set_healthy(2, false);

        let counts = f.counts(300);
        assert_eq!(counts[1] + counts[2], 0);
        for i in [0, 3, 4] {
            assert!((90..=110).contains(&counts[i]), "backend {i} got {}", counts[i]);
        }
    }

    #[test]
    fn test_failing_backend_receives_exactly_threshold_requests() {
        let f = Fixture::new(2, 3);
        let mut counts = [0usize; 2];

        for _ in 0..20 {
            let idx = f.pick();
            counts[idx] += 1;
            if idx == 1 {
                f.breakers[1].record_failure();
            } else {
                f.breakers[0].record_success();
            }
        }

        assert_eq!(counts[1], 3);
        assert_eq!(counts[0], 17);
    }

    #[test]
    fn test_open_circuit_and_unhealthy_are_independent() {
        let f = Fixture::new(3, 1);
        f.health.set_healthy(0, false);
        f.breakers[2].record_failure();

        for _ in 0..30 {
            assert_eq!(f.pick(), 1);
        }
    }

    #[test]
    fn test_all_unavailable_falls_back_to_cursor() {
        let f = Fixture::new(3, 1);
        f.health.set_healthy(0, false);
        f.health.set_healthy(1, false);
        f.breakers[2].record_failure();

        let picks: Vec<_> = (0..6).map(|_| f.pick()).collect();
        assert_eq!(picks, vec![0, 1, 2, 0, 1, 2]);
    }

    #[test]
    fn test_pick_always_in_range() {
        // Every combination of health and circuit state for three backends.
        for mask in 0u32..64 {
            let f = Fixture::new(3, 1);
            for i in 0..3 {
                if mask & (1 << i) != 0 {
                    f.health.set_healthy(i, false);
                }
                if mask & (1 << (i + 3)) != 0 {
                    f.breakers[i].record_failure();
                }
            }
            for _ in 0..10 {
                let idx = f.pick();
                assert!(idx < 3, "mask {mask:#b} picked {idx}");
            }
        }
    }

    #[test]
    fn test_concurrent_picks() {
        let f = Arc::new(Fixture::new(4, 5));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let f = f.clone();
                std::thread::spawn(move || f.counts(1000))
            })
            .collect();

        let mut totals = vec![0; 4];
        for h in handles {
            for (i, c) in h.join().unwrap().into_iter().enumerate() {
                totals[i] += c;
            }
        }
        assert_eq!(totals.iter().sum::<usize>(), 8000);
        // The cursor hands out distinct slots, so the split is exact.
        assert!(totals.iter().all(|c| *c == 2000), "{totals:?}");
    }
}
