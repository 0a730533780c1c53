pub mod cpu;
pub mod wgpu_backend;

use std::sync::atomic::{AtomicBool, AtomicU64};
use std::sync::mpsc;
use std::time::Duration;

use crate::pattern::Pattern;

/// Work-items per dispatch on the GPU path; the CPU path slices the same
/// batch across its workers.
pub const DEFAULT_BATCH_SIZE: u32 = 65_536;

/// Work-group size (GPU) / worker count (CPU) default.
pub const DEFAULT_THREADS: u32 = 64;

pub struct SearchConfig {
    pub pattern: Pattern,
}

/// One verified winner, published between dispatches.
pub struct Found {
    pub work_item: u32,
    pub public_key: [u8; 32],
    /// seed ‖ compressed public key, the wallet-file form.
    pub keypair: [u8; 64],
    pub address: String,
    pub attempts: u64,
    pub elapsed: Duration,
}

#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("no compute adapter available")]
    NoGpu,
    #[error("GPU dispatch failed: {0}")]
    Dispatch(String),
    #[error("verification failed for reported address {0}")]
    Verification(String),
}

pub trait SearchBackend: Send + Sync {
    fn name(&self) -> &str;

    /// Run dispatches until the stop flag is set or the receiver hangs up;
    /// the driver owns the match count. Bumps `total` by exactly the batch
    /// size per completed dispatch.
    fn run(
        &self,
        config: &SearchConfig,
        stop: &AtomicBool,
        total: &AtomicU64,
        tx: mpsc::Sender<Found>,
    ) -> Result<(), SearchError>;
}

/// Draw the per-dispatch 128-bit seed from the host CSPRNG.
pub fn fresh_host_seed() -> [u64; 2] {
    use rand::RngCore;
    let mut bytes = [0u8; 16];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    [
        u64::from_le_bytes(bytes[..8].try_into().expect("8-byte half")),
        u64::from_le_bytes(bytes[8..].try_into().expect("8-byte half")),
    ]
}
