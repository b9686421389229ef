// Tests for the REPL session: reporting, errors, interrupts and input handling.

use test_case::test_case;
use yeast::config::Config;
use yeast::runtime::data_structures::cell::Cell;
use yeast::runtime::error::{self, ErrorKind};
use yeast::runtime::session::io::{InputSource, ScriptedInput};
use yeast::runtime::session::{ReportStyle, Session, SessionState};
use yeast::runtime::terminal::Interrupt;

fn session_with(report: ReportStyle) -> Session {
    let config = Config {
        report,
        ..Config::default()
    };

    Session::start(config, None).unwrap()
}

fn run_script(script: &str) -> String {
    let mut session = session_with(ReportStyle::Ok).with_input(ScriptedInput::from_text(script));
    let mut sink = Vec::new();

    session.run(&mut sink).unwrap();
    assert!(session.is_terminated());

    String::from_utf8(sink).unwrap()
}

#[test_case("1 2 +", " ok\n"; "plain unit")]
#[test_case("", " ok\n"; "empty unit")]
#[test_case("3 4 * .", "12  ok\n"; "output comes before the report")]
#[test_case(": sq dup", " compiled\n"; "open definition")]
#[test_case("foo", "foo ?\n"; "unknown token")]
#[test_case("1 foo 2", "foo ?\n"; "unknown token after work")]
#[test_case("+", "Stack underflow.\n"; "underflow")]
fn ok_reports(unit: &str, expected: &str) {
    let mut session = session_with(ReportStyle::Ok);
    let _ = session.feed(unit);

    assert_eq!(session.take_output(), expected);
    assert_eq!(session.state(), SessionState::Reading);
}

#[test]
fn quiet_sessions_only_print_errors() {
    let mut session = session_with(ReportStyle::Quiet);

    session.feed("1 2 + .").unwrap();
    let _ = session.feed("nope");

    assert_eq!(session.take_output(), "3 nope ?\n");
}

#[test]
fn stack_reports_show_the_data_stack() {
    let mut session = session_with(ReportStyle::Stack);

    session.feed("1 2").unwrap();
    assert_eq!(session.take_output(), "<2> 1 2 \n");

    session.feed("drop drop").unwrap();
    assert_eq!(session.take_output(), "<0> \n");
}

#[test]
fn stack_reports_show_pending_frames() {
    let mut session = session_with(ReportStyle::Stack);

    session.feed("combinators k").unwrap();
    assert_eq!(session.take_output(), "<0>  <1> frame top k\n");
}

#[test]
fn definitions_span_units() {
    let mut session = session_with(ReportStyle::Ok);

    session.feed(": sq dup").unwrap();
    session.feed("* ;").unwrap();
    session.feed("7 sq .").unwrap();

    assert_eq!(session.take_output(), " compiled\n ok\n49  ok\n");
}

#[test]
fn an_error_does_not_end_the_session() {
    let mut session = session_with(ReportStyle::Quiet);

    assert!(session.feed("drop").is_err());
    assert_eq!(session.state(), SessionState::Reading);

    session.feed("5 .").unwrap();
    assert_eq!(session.take_output(), "Stack underflow.\n5 ");
}

#[test]
fn verbose_errors_include_the_location() {
    let config = Config {
        report: ReportStyle::Quiet,
        verbose_errors: true,
        ..Config::default()
    };
    let mut session = Session::start(config, None).unwrap().with_source_name("script.ys");

    let _ = session.feed("1 2 bogus");
    let output = session.take_output();

    assert!(output.contains("script.ys"), "{}", output);
    assert!(output.contains("bogus ?"), "{}", output);
}

#[test]
fn errors_carry_the_call_stack() {
    let mut session = session_with(ReportStyle::Quiet);

    session.feed(": inner drop ;").unwrap();
    session.feed(": outer inner ;").unwrap();

    let error = session.feed("outer").unwrap_err();

    assert_eq!(error.kind(), &ErrorKind::StackUnderflow);
    assert_eq!(
        error.call_stack(),
        &Some(vec!["outer".to_string(), "inner".to_string()])
    );
    assert!(session.image().returns.is_empty());
}

#[test]
fn bye_terminates() {
    let mut session = session_with(ReportStyle::Quiet);

    session.feed("1 bye 2").unwrap();
    assert!(session.is_terminated());

    session.feed("3").unwrap();
    assert_eq!(session.image().data.items(), &[Cell::Int(1)]);
}

#[test]
fn run_stops_at_bye() {
    assert_eq!(run_script("1 .\nbye\n2 .\n"), "1  ok\n ok\n");
}

#[test]
fn run_stops_at_end_of_input() {
    assert_eq!(run_script("1 2 + .\nfoo\n"), "3  ok\nfoo ?\n");
}

#[test]
fn key_shares_the_input_with_units() {
    assert_eq!(run_script("key .\nxy\n"), "120  ok\ny ?\n");
}

#[test]
fn an_interrupt_cancels_one_unit() {
    let mut session = session_with(ReportStyle::Quiet);
    let interrupt = session.interrupt();

    interrupt.request();

    let error = session.feed("1 2").unwrap_err();
    assert_eq!(error.kind(), &ErrorKind::Interrupted);
    assert!(session.image().data.is_empty());
    assert!(!interrupt.is_requested());

    session.feed("3").unwrap();
    assert_eq!(session.image().data.items(), &[Cell::Int(3)]);
}

#[test]
fn fuel_is_refilled_for_every_unit() {
    let config = Config {
        report: ReportStyle::Quiet,
        fuel: 10,
        ..Config::default()
    };
    let mut session = Session::start(config, None).unwrap();

    session.feed(": five 1 1 1 1 1 ;").unwrap();
    session.feed("five").unwrap();
    session.feed("five").unwrap();

    assert_eq!(session.image().data.len(), 10);
    assert!(matches!(
        session.feed("five five").unwrap_err().kind(),
        ErrorKind::StepBudgetExceeded(10)
    ));
}

/// Input that raises the interrupt every time it hands out a unit.
struct RaisingInput {
    interrupt: Interrupt,
    units: Vec<String>,
}

impl InputSource for RaisingInput {
    fn next_unit(&mut self) -> error::Result<Option<String>> {
        if self.units.is_empty() {
            return Ok(None);
        }

        self.interrupt.request();
        Ok(Some(self.units.remove(0)))
    }

    fn next_char(&mut self) -> error::Result<Option<char>> {
        Ok(None)
    }
}

#[test]
fn an_interrupt_raised_while_reading_is_dropped() {
    let session = session_with(ReportStyle::Ok);
    let interrupt = session.interrupt();

    let mut session = session.with_input(RaisingInput {
        interrupt: interrupt.clone(),
        units: vec!["1 2 +".to_string(), ".".to_string()],
    });
    let mut sink = Vec::new();

    session.run(&mut sink).unwrap();

    assert_eq!(String::from_utf8(sink).unwrap(), " ok\n3  ok\n");
    assert!(!interrupt.is_requested());
}

#[test]
fn stop_returns_a_dump() {
    let mut session = session_with(ReportStyle::Quiet);
    session.feed("1 2").unwrap();

    let dump = session.stop();

    assert!(dump.starts_with("yeast-image 2\n"));
    assert!(dump.contains("\ndata 1 2\n"));
}
