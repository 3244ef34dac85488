mod cache;

pub use cache::{CacheError, CacheResult};

pub trait IsRetryable {
    fn is_retryable(&self) -> bool;
}
