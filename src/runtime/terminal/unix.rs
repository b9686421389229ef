use crate::runtime::{
    error::{self, ErrorKind, machine_error},
    terminal::{process_interrupt, raise_process_interrupt},
};
use libc::{SIG_ERR, SIGINT, STDIN_FILENO, c_int, isatty, sighandler_t, signal};
use std::io::Error;

extern "C" fn handle_sigint(_signal: c_int) {
    raise_process_interrupt();
}

/// Route SIGINT to the process interrupt handle instead of killing the process.
pub fn install_interrupt_handler() -> error::Result<()> {
    // Make sure the handle exists before the handler can fire.
    let _ = process_interrupt();

    let previous = unsafe { signal(SIGINT, handle_sigint as extern "C" fn(c_int) as sighandler_t) };

    if previous == SIG_ERR {
        return machine_error(ErrorKind::Io(format!(
            "Could not install the interrupt handler: {}",
            Error::last_os_error()
        )));
    }

    Ok(())
}

/// Is standard input attached to a terminal?
pub fn stdin_is_terminal() -> bool {
    unsafe { isatty(STDIN_FILENO) == 1 }
}
