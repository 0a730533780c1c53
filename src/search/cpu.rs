use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc;
use std::time::Instant;

use super::{Found, SearchBackend, SearchConfig, SearchError, DEFAULT_BATCH_SIZE};
use crate::kernel;

pub struct CpuBackend {
    pub workers: usize,
}

impl SearchBackend for CpuBackend {
    fn name(&self) -> &str {
        "cpu"
    }

    fn run(
        &self,
        config: &SearchConfig,
        stop: &AtomicBool,
        total: &AtomicU64,
        tx: mpsc::Sender<Found>,
    ) -> Result<(), SearchError> {
        let start = Instant::now();
        let workers = self.workers.max(1) as u32;
        // same nominal batch as the GPU path, sliced across the pool
        let slice = DEFAULT_BATCH_SIZE.div_ceil(workers);
        let batch_size = slice as u64 * workers as u64;
        eprintln!("[cpu] {workers} workers, {batch_size} attempts per batch");

        while !stop.load(Ordering::Relaxed) {
            let host_seed = super::fresh_host_seed();
            let claimed = AtomicBool::new(false);
            let pattern = &config.pattern;

            // One task per sub-slice; the scope join is the batch barrier.
            let winner = std::thread::scope(|s| {
                let handles: Vec<_> = (0..workers)
                    .map(|w| {
                        let claimed = &claimed;
                        s.spawn(move || {
                            let base = w * slice;
                            for i in 0..slice {
                                if claimed.load(Ordering::Relaxed) {
                                    return None;
                                }
                                let c = kernel::candidate(host_seed, base + i);
                                if pattern.matches(c.address()) {
                                    // at most one worker wins the batch
                                    if claimed
                                        .compare_exchange(
                                            false,
                                            true,
                                            Ordering::Relaxed,
                                            Ordering::Relaxed,
                                        )
                                        .is_ok()
                                    {
                                        return Some((base + i, c));
                                    }
                                    return None;
                                }
                            }
                            None
                        })
                    })
                    .collect();
                handles
                    .into_iter()
                    .filter_map(|h| h.join().ok().flatten())
                    .next()
            });

            total.fetch_add(batch_size, Ordering::Relaxed);

            if let Some((work_item, c)) = winner {
                let address = String::from_utf8(c.address().to_vec())
                    .expect("base58 output is ASCII");
                let found = Found {
                    work_item,
                    public_key: c.public_key,
                    keypair: kernel::keypair_bytes(&c.seed, &c.public_key),
                    address,
                    attempts: total.load(Ordering::Relaxed),
                    elapsed: start.elapsed(),
                };
                if tx.send(found).is_err() {
                    break;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::pattern::{MatchMode, Pattern};

    /// Drive the backend the way the host loop does: collect `target`
    /// matches, then raise the stop flag.
    fn run_search(pattern: Pattern, target: usize) -> Vec<Found> {
        let stop = Arc::new(AtomicBool::new(false));
        let total = Arc::new(AtomicU64::new(0));
        let (tx, rx) = mpsc::channel();
        let handle = {
            let stop = stop.clone();
            let total = total.clone();
            std::thread::spawn(move || {
                let backend = CpuBackend { workers: 4 };
                let config = SearchConfig { pattern };
                backend.run(&config, &stop, &total, tx)
            })
        };
        let mut found = Vec::with_capacity(target);
        while found.len() < target {
            found.push(rx.recv().expect("backend should keep producing"));
        }
        stop.store(true, Ordering::Relaxed);
        // drain anything the final batches still produced
        while rx.recv().is_ok() {}
        handle.join().unwrap().unwrap();
        found
    }

    #[test]
    fn wildcard_pattern_finds_and_verifies() {
        let pattern = Pattern::new("?", MatchMode::Prefix, true).unwrap();
        let found = run_search(pattern, 1);
        let f = &found[0];
        // the reported address re-encodes from the compressed key
        assert_eq!(f.address, bs58::encode(&f.public_key).into_string());
        // and the key re-derives from the persisted seed half
        let seed: [u8; 32] = f.keypair[..32].try_into().unwrap();
        assert_eq!(kernel::derive_public_key(&seed), f.public_key);
        assert_eq!(&f.keypair[32..], &f.public_key);
    }

    #[test]
    fn attempts_are_whole_batches() {
        let pattern = Pattern::new("?", MatchMode::Prefix, true).unwrap();
        let stop = Arc::new(AtomicBool::new(false));
        let total = Arc::new(AtomicU64::new(0));
        let (tx, rx) = mpsc::channel();
        let handle = {
            let stop = stop.clone();
            let total = total.clone();
            std::thread::spawn(move || {
                let backend = CpuBackend { workers: 3 };
                let config = SearchConfig { pattern };
                backend.run(&config, &stop, &total, tx)
            })
        };
        let _ = rx.recv().expect("wildcard matches immediately");
        stop.store(true, Ordering::Relaxed);
        while rx.recv().is_ok() {}
        handle.join().unwrap().unwrap();

        let batch = DEFAULT_BATCH_SIZE.div_ceil(3) as u64 * 3;
        assert_eq!(total.load(Ordering::Relaxed) % batch, 0);
        assert!(total.load(Ordering::Relaxed) >= batch);
    }

    #[test]
    fn multi_match_continues_past_first_hit() {
        let pattern = Pattern::new("??", MatchMode::Suffix, true).unwrap();
        let found = run_search(pattern, 3);
        assert_eq!(found.len(), 3);
        let mut attempts = 0;
        for f in &found {
            assert!(f.attempts >= attempts, "attempts increase monotonically");
            attempts = f.attempts;
        }
    }

    #[test]
    fn stop_flag_halts_before_work() {
        let pattern = Pattern::new("?", MatchMode::Prefix, true).unwrap();
        let backend = CpuBackend { workers: 2 };
        let config = SearchConfig { pattern };
        let stop = AtomicBool::new(true);
        let total = AtomicU64::new(0);
        let (tx, _rx) = mpsc::channel();
        backend.run(&config, &stop, &total, tx).unwrap();
        assert_eq!(total.load(Ordering::Relaxed), 0);
    }
}
