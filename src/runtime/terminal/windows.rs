use crate::runtime::{
    error::{self, ErrorKind, machine_error},
    terminal::{process_interrupt, raise_process_interrupt},
};
use std::io::Error;
use winapi::{
    shared::minwindef::{BOOL, DWORD, FALSE, TRUE},
    um::{
        consoleapi::{GetConsoleMode, SetConsoleCtrlHandler},
        processenv::GetStdHandle,
        winbase::STD_INPUT_HANDLE,
        wincon::{CTRL_BREAK_EVENT, CTRL_C_EVENT},
    },
};

unsafe extern "system" fn handle_console_control(control_type: DWORD) -> BOOL {
    match control_type {
        CTRL_C_EVENT | CTRL_BREAK_EVENT => {
            raise_process_interrupt();
            TRUE
        }
        _ => FALSE,
    }
}

/// Route Ctrl-C to the process interrupt handle instead of ending the process.
pub fn install_interrupt_handler() -> error::Result<()> {
    let _ = process_interrupt();

    if unsafe { SetConsoleCtrlHandler(Some(handle_console_control), TRUE) } == 0 {
        return machine_error(ErrorKind::Io(format!(
            "Could not install the interrupt handler: {}",
            Error::last_os_error()
        )));
    }

    Ok(())
}

/// Is standard input attached to a console?
pub fn stdin_is_terminal() -> bool {
    let mut mode: DWORD = 0;

    unsafe { GetConsoleMode(GetStdHandle(STD_INPUT_HANDLE), &mut mode) != 0 }
}
