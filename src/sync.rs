//! ISR/mainline shared-state container.
//!
//! Single-core, two-context model: interrupt handlers preempt one
//! non-preemptive mainline loop. Every value touched from both contexts
//! lives in an [`IsrCell`], which grants scoped exclusive access with
//! interrupts suppressed for the duration of the closure and restored on
//! every exit path.
//!
//! On the ESP-IDF target the `critical-section` implementation comes
//! from `esp-idf-sys`; host tests link the `std` implementation from the
//! dev-dependency.
//!
//! Keep the closures short: a byte copy, a read-modify-write, a state
//! transition. Dispatch logic, PWM writes and config persistence run
//! outside the critical section.

use core::cell::RefCell;

use critical_section::Mutex;

/// Scoped, interrupt-suppressed exclusive access to `T`.
pub struct IsrCell<T> {
    inner: Mutex<RefCell<T>>,
}

impl<T> IsrCell<T> {
    pub const fn new(value: T) -> Self {
        Self {
            inner: Mutex::new(RefCell::new(value)),
        }
    }

    /// Run `f` with exclusive access to the value.
    pub fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        critical_section::with(|cs| f(&mut self.inner.borrow_ref_mut(cs)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_returns_closure_result() {
        let cell = IsrCell::new(41u32);
        assert_eq!(cell.with(|v| *v + 1), 42);
    }

    #[test]
    fn mutations_persist_between_accesses() {
        let cell = IsrCell::new(0u8);
        cell.with(|v| *v = 7);
        assert_eq!(cell.with(|v| *v), 7);
    }

    #[test]
    fn const_construction_in_static() {
        static CELL: IsrCell<u16> = IsrCell::new(123);
        assert_eq!(CELL.with(|v| *v), 123);
    }
}
