//! Thread pools and cancellation, shared by the extraction and colorization
//! settings
use crate::Error;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

/// Rayon pool on which lattice sampling and colorization run
///
/// Settings structs hold an `Option<&ThreadPool>`, where `None` means that
/// everything runs on the calling thread.
pub enum ThreadPool {
    /// Dedicated pool
    Custom(rayon::ThreadPool),
    /// Rayon's global pool
    Global,
}

impl ThreadPool {
    /// Builds a dedicated pool with the given number of threads
    pub fn with_threads(n: usize) -> Result<Self, rayon::ThreadPoolBuildError> {
        let pool = rayon::ThreadPoolBuilder::new().num_threads(n).build()?;
        Ok(Self::Custom(pool))
    }

    /// Runs a closure within the pool, so that parallel iterators inside it
    /// use the pool's threads
    pub fn run<F: FnOnce() -> V + Send, V: Send>(&self, f: F) -> V {
        match self {
            Self::Custom(p) => p.install(f),
            Self::Global => f(),
        }
    }

    /// Returns the number of worker threads
    pub fn thread_count(&self) -> usize {
        match self {
            Self::Custom(p) => p.current_num_threads(),
            Self::Global => rayon::current_num_threads(),
        }
    }
}

/// Shared flag used to abandon a long-running extraction or colorization
///
/// Clones share the same flag.  Cancellation is only observed at coarse
/// boundaries (between grid slabs and between color batches), never in the
/// middle of a batch.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Builds a token which is not yet cancelled
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Checks whether cancellation has been requested
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// Returns [`Error::Cancelled`] if cancellation has been requested
    pub(crate) fn check(&self) -> Result<(), Error> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_cancel_token_is_shared() {
        let a = CancelToken::new();
        let b = a.clone();
        assert!(b.check().is_ok());
        a.cancel();
        assert!(b.is_cancelled());
        assert!(matches!(b.check(), Err(Error::Cancelled)));
    }

    #[test]
    fn test_custom_pool() {
        let pool = ThreadPool::with_threads(3).unwrap();
        assert_eq!(pool.thread_count(), 3);
        assert_eq!(pool.run(rayon::current_num_threads), 3);
    }
}
