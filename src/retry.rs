use std::thread;
use std::time::Duration;

use tracing::warn;

use crate::error::MarkerError;

pub const DEFAULT_RETRIES: usize = 3;
pub const DEFAULT_BASE_DELAY_MS: u64 = 200;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub retries: usize,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: DEFAULT_RETRIES,
            base_delay: Duration::from_millis(DEFAULT_BASE_DELAY_MS),
        }
    }
}

impl RetryPolicy {
    pub fn new(retries: usize, base_delay: Duration) -> Self {
        Self {
            retries,
            base_delay,
        }
    }

    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    pub fn run<T, F>(&self, what: &str, mut op: F) -> Result<T, MarkerError>
    where
        F: FnMut() -> Result<T, MarkerError>,
    {
        let mut attempt = 0usize;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(err) if attempt < self.retries && err.is_transient() => {
                    attempt += 1;
                    let delay = self.base_delay * attempt as u32;
                    warn!(
                        attempt,
                        retries = self.retries,
                        delay_ms = delay.as_millis() as u64,
                        "{what} failed, retrying: {err}"
                    );
                    thread::sleep(delay);
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use assert_matches::assert_matches;

    use super::*;

    fn transient() -> MarkerError {
        MarkerError::Remote {
            op: "get",
            key: "genomes.tsv.gz".to_string(),
            message: "connection reset".to_string(),
        }
    }

    #[test]
    fn recovers_after_transient_failures() {
        let calls = Cell::new(0);
        let policy = RetryPolicy::new(3, Duration::ZERO);
        let value = policy
            .run("download", || {
                calls.set(calls.get() + 1);
                if calls.get() < 3 {
                    Err(transient())
                } else {
                    Ok(7)
                }
            })
            .unwrap();
        assert_eq!(value, 7);
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn gives_up_after_bound() {
        let calls = Cell::new(0);
        let policy = RetryPolicy::new(2, Duration::ZERO);
        let err = policy
            .run("download", || -> Result<(), MarkerError> {
                calls.set(calls.get() + 1);
                Err(transient())
            })
            .unwrap_err();
        assert_matches!(err, MarkerError::Remote { .. });
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn permanent_errors_are_not_retried() {
        let calls = Cell::new(0);
        let policy = RetryPolicy::new(5, Duration::ZERO);
        let err = policy
            .run("exists", || -> Result<(), MarkerError> {
                calls.set(calls.get() + 1);
                Err(MarkerError::RemoteNotFound("x".to_string()))
            })
            .unwrap_err();
        assert_matches!(err, MarkerError::RemoteNotFound(_));
        assert_eq!(calls.get(), 1);
    }
}
