// Batch sequence numbering for upload artifacts

use std::sync::Mutex;

use crate::core::error::{DecayError, Result};

/// Process-wide batch counter. Starts at 0; each `next` call is one
/// committed ingest and returns the incremented value.
pub trait SequenceCounter: Send + Sync {
    fn next(&self) -> Result<u64>;

    fn current(&self) -> Result<u64>;
}

#[derive(Debug, Default)]
pub struct MemorySequence {
    value: Mutex<u64>,
}

impl MemorySequence {
    pub fn new() -> Self {
        Self::starting_at(0)
    }

    pub fn starting_at(value: u64) -> Self {
        Self {
            value: Mutex::new(value),
        }
    }
}

impl SequenceCounter for MemorySequence {
    fn next(&self) -> Result<u64> {
        let mut value = self
            .value
            .lock()
            .map_err(|_| DecayError::LockPoisoned("sequence counter"))?;
        *value += 1;
        Ok(*value)
    }

    fn current(&self) -> Result<u64> {
        self.value
            .lock()
            .map(|v| *v)
            .map_err(|_| DecayError::LockPoisoned("sequence counter"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_starts_at_zero() {
        let seq = MemorySequence::new();
        assert_eq!(seq.current().unwrap(), 0);
        assert_eq!(seq.next().unwrap(), 1);
        assert_eq!(seq.next().unwrap(), 2);
        assert_eq!(seq.current().unwrap(), 2);
    }

    #[test]
    fn test_concurrent_numbers_are_unique() {
        let seq = Arc::new(MemorySequence::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let seq = seq.clone();
                thread::spawn(move || (0..50).map(|_| seq.next().unwrap()).collect::<Vec<_>>())
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for n in handle.join().unwrap() {
                assert!(seen.insert(n));
            }
        }
        assert_eq!(seen.len(), 400);
        assert_eq!(seq.current().unwrap(), 400);
    }
}
