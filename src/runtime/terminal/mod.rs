use crate::runtime::error::{self, ErrorKind, machine_error};
use lazy_static::lazy_static;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

#[cfg(unix)]
mod unix;

#[cfg(unix)]
pub use unix::{install_interrupt_handler, stdin_is_terminal};

#[cfg(windows)]
mod windows;

#[cfg(windows)]
pub use windows::{install_interrupt_handler, stdin_is_terminal};

/// A cancellation request flag shared between the session and whoever wants to stop it.  The
/// machine polls it between token dispatches, threaded body cells and combinator firings.
#[derive(Clone, Debug, Default)]
pub struct Interrupt(Arc<AtomicBool>);

impl Interrupt {
    pub fn new() -> Interrupt {
        Interrupt(Arc::new(AtomicBool::new(false)))
    }

    /// Ask the running unit to stop.
    pub fn request(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn clear(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    /// Fail with `Interrupted` if a stop was requested.
    pub fn check(&self) -> error::Result<()> {
        if self.is_requested() {
            return machine_error(ErrorKind::Interrupted);
        }

        Ok(())
    }
}

lazy_static! {
    /// The handle the platform interrupt handler signals.  It holds no machine state.
    static ref PROCESS_INTERRUPT: Interrupt = Interrupt::new();
}

/// The process wide interrupt handle.
pub fn process_interrupt() -> Interrupt {
    PROCESS_INTERRUPT.clone()
}

/// Called from the platform handlers.
fn raise_process_interrupt() {
    PROCESS_INTERRUPT.request();
}
