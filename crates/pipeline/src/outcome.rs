//! Result type for advisory components.

use crate::store::StoreError;

/// What an advisory component (cache, queue, rate limiter) returns.
///
/// `Ok(None)`-style values mean "no data"; `Degraded` means the backend is
/// broken and the caller should fall back to the neutral behaviour. The
/// failure has already been logged by the component.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    Ok(T),
    Degraded(String),
}

impl<T> Outcome<T> {
    /// Convert a backend result, logging the failure under `operation`.
    pub fn from_store(operation: &'static str, result: Result<T, StoreError>) -> Self {
        match result {
            Ok(value) => Outcome::Ok(value),
            Err(e) => {
                tracing::error!(operation, error = %e, "Store operation failed");
                Outcome::Degraded(e.to_string())
            }
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Outcome::Degraded(_))
    }

    pub fn ok(self) -> Option<T> {
        match self {
            Outcome::Ok(value) => Some(value),
            Outcome::Degraded(_) => None,
        }
    }

    /// The value, or `fallback` when degraded.
    pub fn unwrap_or(self, fallback: T) -> T {
        self.ok().unwrap_or(fallback)
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Outcome::Ok(value) => Outcome::Ok(f(value)),
            Outcome::Degraded(reason) => Outcome::Degraded(reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn degraded_falls_back() {
        let outcome: Outcome<usize> =
            Outcome::from_store("llen", Err(StoreError::Unavailable("down".into())));
        assert!(outcome.is_degraded());
        assert_eq!(outcome.clone().unwrap_or(0), 0);
        assert_eq!(outcome.map(|n| n + 1), Outcome::Degraded("Store backend unavailable: down".into()));
    }

    #[test]
    fn ok_passes_through() {
        let outcome = Outcome::from_store("llen", Ok(3usize));
        assert_eq!(outcome.clone().ok(), Some(3));
        assert_eq!(outcome.map(|n| n * 2), Outcome::Ok(6));
    }
}
