//! Lock-free bounded counter of logged-in sessions.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Capacity gate for logins.
///
/// `try_admit` never lets the count exceed `max`, and only fails when the
/// count it observed was already at `max`.
pub struct Admission {
    count: AtomicUsize,
    max: usize,
}

impl Admission {
    pub fn new(max: usize) -> Self {
        Self {
            count: AtomicUsize::new(0),
            max,
        }
    }

    /// Reserve one slot. Retries on a lost CAS race until it either wins or
    /// sees the counter at capacity.
    pub fn try_admit(&self) -> bool {
        let mut current = self.count.load(Ordering::Acquire);
        loop {
            if current >= self.max {
                return false;
            }
            match self.count.compare_exchange_weak(
                current,
                current + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }

    /// Return a slot obtained from a successful `try_admit`.
    pub fn release(&self) {
        let previous = self.count.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(previous > 0, "admission released more often than admitted");
    }

    pub fn count(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }

    pub fn max(&self) -> usize {
        self.max
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn admits_up_to_capacity() {
        let admission = Admission::new(2);
        assert!(admission.try_admit());
        assert!(admission.try_admit());
        assert!(!admission.try_admit());
        admission.release();
        assert!(admission.try_admit());
        assert_eq!(admission.count(), 2);
    }

    #[test]
    fn concurrent_admissions_never_overshoot() {
        let admission = Arc::new(Admission::new(20));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let admission = Arc::clone(&admission);
                std::thread::spawn(move || (0..50).filter(|_| admission.try_admit()).count())
            })
            .collect();
        let admitted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(admitted, 20);
        assert_eq!(admission.count(), 20);
    }
}
