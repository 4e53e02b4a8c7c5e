//! Ambient-light interrupt flag.
//!
//! The interrupt handler only calls [`AmbientFlag::raise`]; the control
//! loop consumes the event with [`AmbientFlag::take`].

use std::sync::atomic::{AtomicBool, Ordering};

/// Single-writer / single-reader event flag.
///
/// # Example
///
/// ```rust
/// use chroma_sensor::AmbientFlag;
///
/// static AMBIENT: AmbientFlag = AmbientFlag::new();
///
/// AMBIENT.raise();
/// assert!(AMBIENT.take());
/// assert!(!AMBIENT.take());
/// ```
#[derive(Debug, Default)]
pub struct AmbientFlag {
    raised: AtomicBool,
}

impl AmbientFlag {
    /// Creates a lowered flag.
    pub const fn new() -> Self {
        Self {
            raised: AtomicBool::new(false),
        }
    }

    /// Marks an ambient-light threshold event.
    #[inline]
    pub fn raise(&self) {
        self.raised.store(true, Ordering::Release);
    }

    /// Consumes a pending event.
    #[inline]
    pub fn take(&self) -> bool {
        self.raised.swap(false, Ordering::AcqRel)
    }

    /// `true` if an event is pending.
    #[inline]
    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_raise_from_other_thread() {
        let flag = Arc::new(AmbientFlag::new());
        let writer = Arc::clone(&flag);
        std::thread::spawn(move || writer.raise()).join().unwrap();
        assert!(flag.is_raised());
        assert!(flag.take());
        assert!(!flag.is_raised());
    }
}
