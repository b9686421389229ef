use crate::{
    config::Config,
    lang::source_buffer::SourceLocation,
    runtime::{
        built_ins::stack_machine::{render_continuations, render_data_stack},
        data_structures::memory_image::MemoryImage,
        error,
        interpreter::evaluator::Evaluator,
        serializer,
        session::io::{InputSource, OutputSink, ScriptedInput},
        terminal::Interrupt,
    },
};
use serde::Deserialize;
use std::mem;
use tracing::{debug, warn};

/// Module for the input and output seams of a session.
pub mod io;

/// Where a session is in its read, dispatch, report loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Reading,
    Dispatching,
    Reporting,
    Erroring,
    Terminated,
}

/// What is printed after a unit succeeds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ReportStyle {
    /// Nothing.
    Quiet,

    /// ` ok`, or ` compiled` while a definition is open.
    #[default]
    Ok,

    /// The data stack, and the continuation stack when anything is pending.
    Stack,
}

/// The REPL core.  A session owns one memory image, feeds it input units and collects what the
/// machine prints until the caller takes it.
pub struct Session {
    config: Config,
    image: MemoryImage,
    input: Box<dyn InputSource>,
    output: Vec<u8>,
    interrupt: Interrupt,
    state: SessionState,
    source: SourceLocation,
    units: usize,
}

impl Session {
    /// Start a session, from a fresh image or from a dump.
    pub fn start(config: Config, dump: Option<&str>) -> error::Result<Session> {
        let image = match dump {
            Some(text) => serializer::load(text, config.permit_shadowing)?,
            None => MemoryImage::boot(&config)?,
        };

        debug!(loaded = dump.is_some(), mode = image.mode.name(), "Session started.");

        Ok(Session {
            config,
            image,
            input: Box::new(ScriptedInput::empty()),
            output: Vec::new(),
            interrupt: Interrupt::new(),
            state: SessionState::Reading,
            source: SourceLocation::new_from_path("<repl>"),
            units: 0,
        })
    }

    /// Read units and `key` characters from this source.
    pub fn with_input(mut self, input: impl InputSource + 'static) -> Session {
        self.input = Box::new(input);
        self
    }

    /// Share an interrupt handle, the process wide one for instance.
    pub fn with_interrupt(mut self, interrupt: Interrupt) -> Session {
        self.interrupt = interrupt;
        self
    }

    /// Name the input in error locations.
    pub fn with_source_name(mut self, name: &str) -> Session {
        self.source = SourceLocation::new_from_path(name);
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_terminated(&self) -> bool {
        self.state == SessionState::Terminated
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn image(&self) -> &MemoryImage {
        &self.image
    }

    /// A handle that cancels the unit being dispatched.
    pub fn interrupt(&self) -> Interrupt {
        self.interrupt.clone()
    }

    /// Dispatch one input unit and queue its report.  An error is reported to the output like any
    /// other result and also returned, the session itself carries on reading.
    pub fn feed(&mut self, unit: &str) -> error::Result<()> {
        if self.is_terminated() {
            return Ok(());
        }

        self.units += 1;
        self.set_state(SessionState::Dispatching);
        self.image.fuel.refill();

        let start = self.source.at_line(self.units);
        let (result, bye) = {
            let mut evaluator = Evaluator::new(
                &mut self.image,
                self.input.as_mut(),
                &mut self.output,
                &self.interrupt,
            );

            let result = evaluator.eval_unit(unit, start);
            (result, evaluator.bye_requested())
        };

        match &result {
            Ok(()) => {
                self.set_state(SessionState::Reporting);
                self.report();
            }
            Err(error) => {
                self.set_state(SessionState::Erroring);
                warn!(error = %error.kind(), "Unit failed.");
                self.report_error(error);
            }
        }

        if bye {
            self.set_state(SessionState::Terminated);
        } else {
            self.set_state(SessionState::Reading);
        }

        result
    }

    /// Everything printed since the last call.
    pub fn take_output(&mut self) -> String {
        String::from_utf8_lossy(&self.take_output_bytes()).into_owned()
    }

    pub fn take_output_bytes(&mut self) -> Vec<u8> {
        mem::take(&mut self.output)
    }

    /// Pull units from the input until it runs out or `bye`, writing output as it is produced.
    /// Only a failure to read input or write output ends the loop early.
    pub fn run(&mut self, sink: &mut dyn OutputSink) -> error::Result<()> {
        while !self.is_terminated() {
            self.set_state(SessionState::Reading);

            let Some(unit) = self.input.next_unit()? else {
                self.set_state(SessionState::Terminated);
                break;
            };

            // Nothing was running while the session waited for input.
            self.interrupt.clear();

            let _ = self.feed(&unit);

            sink.write_output(&self.take_output_bytes())?;
            sink.flush_output()?;
        }

        Ok(())
    }

    /// The image as dump text.
    pub fn dump(&self) -> String {
        serializer::dump(&self.image)
    }

    /// End the session, returning a final dump of its image.
    pub fn stop(mut self) -> String {
        self.set_state(SessionState::Terminated);
        self.dump()
    }

    /// Entering `Reading` always drops any pending interrupt.
    fn set_state(&mut self, state: SessionState) {
        if state == SessionState::Reading {
            self.interrupt.clear();
        }

        if self.state != state {
            debug!(from = ?self.state, to = ?state, "Session state changed.");
            self.state = state;
        }
    }

    fn report(&mut self) {
        let text = match self.config.report {
            ReportStyle::Quiet => return,
            ReportStyle::Ok if self.image.compiling.is_some() => " compiled\n".to_string(),
            ReportStyle::Ok => " ok\n".to_string(),
            ReportStyle::Stack => {
                let mut text = render_data_stack(&self.image);

                if !self.image.continuations.is_empty() {
                    text += &format!(" {}", render_continuations(&self.image));
                }

                text + "\n"
            }
        };

        self.output.extend_from_slice(text.as_bytes());
    }

    fn report_error(&mut self, error: &error::MachineError) {
        let text = if self.config.verbose_errors {
            format!("{}\n", error)
        } else {
            format!("{}\n", error.kind())
        };

        self.output.extend_from_slice(text.as_bytes());
    }
}
