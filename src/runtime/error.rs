
use std::{ error::Error,
           process::Termination,
           fmt::{ self, Debug, Display, Formatter }, process::ExitCode };
use thiserror::Error as ThisError;
use crate::lang::source_buffer::SourceLocation;



pub type Result<T> = std::result::Result<T, MachineError>;



/// The names of the words that were executing when an error was raised, outermost first.
pub type CallStack = Vec<String>;



/// Every way the machine can fail.  All of them are local to the unit being dispatched, the session
/// reports the error and goes back to reading.
#[derive(ThisError, Clone, Debug, PartialEq, Eq)]
pub enum ErrorKind
{
    #[error("Stack underflow.")]
    StackUnderflow,

    #[error("Return stack is empty.")]
    ReturnStackEmpty,

    #[error("Invalid address {0}.")]
    InvalidAddress(i64),

    #[error("Type mismatch, expected {expected} but found {found}.")]
    TypeMismatch { expected: &'static str, found: String },

    #[error("{0} ?")]
    UnknownToken(String),

    #[error("Can not redefine {0}.")]
    RedefinitionError(String),

    #[error("Arity error: {0}.")]
    ArityError(String),

    #[error("Step budget of {0} exceeded.")]
    StepBudgetExceeded(u64),

    #[error("Malformed dump at line {line}: {reason}.")]
    MalformedDump { line: usize, reason: String },

    #[error("{0} stack overflow.")]
    StackOverflow(&'static str),

    #[error("Division by zero.")]
    DivisionByZero,

    #[error("Invalid use of {word}: {reason}.")]
    InvalidWordUse { word: String, reason: String },

    #[error("Interrupted.")]
    Interrupted,

    #[error("I/O error: {0}")]
    Io(String)
}


impl ErrorKind
{
    /// Shorthand for the common type mismatch, naming the kind that was wanted and describing
    /// what was found instead.
    pub fn mismatch(expected: &'static str, found: impl Display) -> ErrorKind
    {
        ErrorKind::TypeMismatch { expected, found: found.to_string() }
    }

    /// Shorthand for a dump parse failure.
    pub fn malformed(line: usize, reason: impl Into<String>) -> ErrorKind
    {
        ErrorKind::MalformedDump { line, reason: reason.into() }
    }
}



/// An error raised by the machine, along with where in the input it happened and what words were
/// running at the time.
#[derive(Clone, PartialEq, Eq)]
pub struct MachineError
{
    /// What went wrong.
    kind: ErrorKind,

    /// The location of the failing token, if available.
    location: Option<SourceLocation>,

    /// The word call stack at the time of the error, if any words were running.
    call_stack: Option<CallStack>
}


impl Error for MachineError
{
}


/// When returned from main, convert the error result to an operating system exit code.
impl Termination for MachineError
{
    /// Because this type represents an error, the exit code is always FAILURE.
    fn report(self) -> ExitCode
    {
        eprintln!("Error: {}", self);
        ExitCode::FAILURE
    }
}


/// Print the error with its location and call stack when they are known.
impl Display for MachineError
{
    fn fmt(&self, f: &mut Formatter) -> fmt::Result
    {
        match &self.location
        {
            Some(location) => write!(f, "{}: {}", location, self.kind)?,
            None => write!(f, "{}", self.kind)?
        }

        if let Some(call_stack) = &self.call_stack
        {
            write!(f, "\n\nCall stack\n")?;

            for item in call_stack.iter().rev()
            {
                writeln!(f, "  {}", item)?;
            }
        }

        Ok(())
    }
}


impl Debug for MachineError
{
    fn fmt(&self, f: &mut Formatter) -> fmt::Result
    {
        write!(f, "{}", self)
    }
}


impl MachineError
{
    /// Create a new MachineError.
    pub fn new(kind: ErrorKind,
               location: Option<SourceLocation>,
               call_stack: Option<CallStack>) -> MachineError
    {
        MachineError
            {
                kind,
                location,
                call_stack
            }
    }

    /// What went wrong.
    pub fn kind(&self) -> &ErrorKind
    {
        &self.kind
    }

    /// If available, the location of the failing token.
    pub fn location(&self) -> &Option<SourceLocation>
    {
        &self.location
    }

    /// If available, the word call stack at the time of the error.
    pub fn call_stack(&self) -> &Option<CallStack>
    {
        &self.call_stack
    }

    /// Attach a location, unless a more precise one was recorded closer to the failure.
    pub fn or_at(mut self, location: &SourceLocation) -> MachineError
    {
        if self.location.is_none()
        {
            self.location = Some(location.clone());
        }

        self
    }

    /// Attach the call stack, unless one is already present.
    pub fn with_call_stack(mut self, call_stack: &CallStack) -> MachineError
    {
        if self.call_stack.is_none() && !call_stack.is_empty()
        {
            self.call_stack = Some(call_stack.clone());
        }

        self
    }
}


impl From<ErrorKind> for MachineError
{
    fn from(kind: ErrorKind) -> MachineError
    {
        MachineError::new(kind, None, None)
    }
}


/// Allow for the conversion of a std::io::Error into a MachineError.
impl From<std::io::Error> for MachineError
{
    fn from(error: std::io::Error) -> MachineError
    {
        MachineError::new(ErrorKind::Io(error.to_string()), None, None)
    }
}



/// Create an error result from a bare kind.
pub fn machine_error<T>(kind: ErrorKind) -> Result<T>
{
    Err(MachineError::from(kind))
}
