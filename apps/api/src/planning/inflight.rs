use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

/// Sessions with an AI call currently outstanding.
///
/// A second generate/review for the same session is refused while the first
/// is running, so a double-click never bills two completions.
#[derive(Clone, Default)]
pub struct InFlight {
    active: Arc<Mutex<HashSet<String>>>,
}

impl InFlight {
    /// Claims `session_id`, or `None` when another request already holds it.
    pub fn try_begin(&self, session_id: &str) -> Option<InFlightGuard> {
        let mut active = lock(&self.active);
        if !active.insert(session_id.to_string()) {
            return None;
        }
        Some(InFlightGuard {
            active: Arc::clone(&self.active),
            session_id: session_id.to_string(),
        })
    }
}

/// Releases the session when dropped, including on early return or panic unwinding.
pub struct InFlightGuard {
    active: Arc<Mutex<HashSet<String>>>,
    session_id: String,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        lock(&self.active).remove(&self.session_id);
    }
}

// The set stays consistent even if a holder panicked, so poisoning is ignored.
fn lock(set: &Mutex<HashSet<String>>) -> MutexGuard<'_, HashSet<String>> {
    set.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_claim_is_refused_until_release() {
        let inflight = InFlight::default();
        let guard = inflight.try_begin("s1").unwrap();
        assert!(inflight.try_begin("s1").is_none());

        drop(guard);
        assert!(inflight.try_begin("s1").is_some());
    }

    #[test]
    fn test_sessions_are_independent() {
        let inflight = InFlight::default();
        let _a = inflight.try_begin("s1").unwrap();
        assert!(inflight.try_begin("s2").is_some());
    }

    #[test]
    fn test_clones_share_state() {
        let inflight = InFlight::default();
        let other = inflight.clone();
        let _g = inflight.try_begin("s1").unwrap();
        assert!(other.try_begin("s1").is_none());
    }
}
