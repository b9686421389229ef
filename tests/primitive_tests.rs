// Parameterized tests for the stack machine primitives, run through a quiet session.

use test_case::test_case;
use yeast::config::Config;
use yeast::runtime::data_structures::cell::Cell;
use yeast::runtime::error::{ErrorKind, Result};
use yeast::runtime::session::io::ScriptedInput;
use yeast::runtime::session::{ReportStyle, Session};

fn quiet_session() -> Session {
    let config = Config {
        report: ReportStyle::Quiet,
        ..Config::default()
    };

    Session::start(config, None).unwrap()
}

fn ints(session: &Session) -> Vec<i64> {
    session
        .image()
        .data
        .items()
        .iter()
        .map(|cell| match cell {
            Cell::Int(value) => *value,
            other => panic!("expected an integer, found {}", other),
        })
        .collect()
}

fn eval_and_stack(word: &str, init_stack: &[i64]) -> Result<Vec<i64>> {
    let mut session = quiet_session();

    for value in init_stack {
        session.feed(&value.to_string())?;
    }

    session.feed(word)?;
    Ok(ints(&session))
}

fn eval_and_output(source: &str) -> String {
    let mut session = quiet_session();
    let _ = session.feed(source);
    session.take_output()
}

fn eval_error(word: &str, init_stack: &[i64]) -> (ErrorKind, Vec<i64>) {
    let mut session = quiet_session();

    for value in init_stack {
        session.feed(&value.to_string()).unwrap();
    }

    let error = session.feed(word).unwrap_err();
    (error.kind().clone(), ints(&session))
}

#[test_case("0", &[], &[0]; "zero")]
#[test_case("42", &[], &[42]; "number")]
#[test_case("-17", &[], &[-17]; "negative number")]
#[test_case("0x1F", &[], &[31]; "hex number")]
#[test_case("+", &[2, 2], &[4]; "simple add")]
#[test_case("+", &[i64::MAX, 1], &[i64::MIN]; "add wraps")]
#[test_case("-", &[5, 2], &[3]; "simple sub")]
#[test_case("-", &[i64::MIN, 1], &[i64::MAX]; "sub wraps")]
#[test_case("*", &[3, 4], &[12]; "simple mul")]
#[test_case("/", &[12, 3], &[4]; "simple div")]
#[test_case("/", &[-7, 2], &[-3]; "div truncates")]
#[test_case("mod", &[13, 5], &[3]; "simple mod")]
#[test_case("nand", &[6, 3], &[-3]; "nand")]
#[test_case("nand", &[-1, -1], &[0]; "nand of all ones")]
#[test_case("0=", &[0], &[-1]; "zero equal")]
#[test_case("0=", &[5], &[0]; "is zero for non-zero")]
#[test_case("and", &[6, 3], &[2]; "and")]
#[test_case("or", &[6, 3], &[7]; "or")]
#[test_case("xor", &[6, 3], &[5]; "xor")]
#[test_case("invert", &[0], &[-1]; "invert")]
#[test_case("invert", &[1], &[-2]; "invert number")]
#[test_case("<", &[1, 2], &[-1]; "less is true")]
#[test_case("<", &[2, 1], &[0]; "less is false")]
#[test_case(">", &[2, 1], &[-1]; "greater is true")]
#[test_case(">", &[1, 1], &[0]; "greater for equal")]
#[test_case("=", &[3, 3], &[-1]; "equal")]
#[test_case("=", &[3, 4], &[0]; "not equal")]
#[test_case("dup", &[1], &[1, 1]; "dup")]
#[test_case("drop", &[1, 2], &[1]; "drop")]
#[test_case("swap", &[1, 2], &[2, 1]; "swap")]
#[test_case("over", &[1, 2], &[1, 2, 1]; "over")]
#[test_case("rot", &[1, 2, 3], &[2, 3, 1]; "rot")]
#[test_case("depth", &[7, 7], &[7, 7, 2]; "depth")]
#[test_case("0 pick", &[10, 20, 30], &[10, 20, 30, 30]; "pick top")]
#[test_case("2 pick", &[10, 20, 30], &[10, 20, 30, 10]; "pick bottom")]
#[test_case(">r r>", &[5], &[5]; "return stack round trip")]
#[test_case(">r rdrop", &[5], &[]; "rdrop")]
#[test_case("5 0 ! 0 @", &[], &[5]; "store then fetch")]
#[test_case("9 3 ! 1 2 + @", &[], &[9]; "fetch computed address")]
fn primitive_results(word: &str, init_stack: &[i64], expected: &[i64]) {
    assert_eq!(eval_and_stack(word, init_stack).unwrap(), expected);
}

#[test_case("+", &[], ErrorKind::StackUnderflow, &[]; "add on empty stack")]
#[test_case("+", &[1], ErrorKind::StackUnderflow, &[1]; "add keeps its operand")]
#[test_case("swap", &[1], ErrorKind::StackUnderflow, &[1]; "swap keeps its operand")]
#[test_case("r>", &[], ErrorKind::ReturnStackEmpty, &[]; "r from on empty")]
#[test_case("rdrop", &[], ErrorKind::ReturnStackEmpty, &[]; "rdrop on empty")]
#[test_case("exit", &[], ErrorKind::ReturnStackEmpty, &[]; "exit at top level")]
#[test_case("/", &[1, 0], ErrorKind::DivisionByZero, &[1, 0]; "div by zero")]
#[test_case("mod", &[1, 0], ErrorKind::DivisionByZero, &[1, 0]; "mod by zero")]
#[test_case("@", &[-1], ErrorKind::InvalidAddress(-1), &[-1]; "negative address")]
#[test_case("@", &[4096], ErrorKind::InvalidAddress(4096), &[4096]; "address past memory")]
#[test_case("3 pick", &[1, 2], ErrorKind::StackUnderflow, &[1, 2, 3]; "pick too deep keeps its literal")]
fn primitive_errors(word: &str, init_stack: &[i64], kind: ErrorKind, remaining: &[i64]) {
    assert_eq!(eval_error(word, init_stack), (kind, remaining.to_vec()));
}

#[test]
fn tokens_before_a_failure_keep_their_effect() {
    let (kind, remaining) = eval_error("1 2 foo 3", &[]);

    assert_eq!(kind, ErrorKind::UnknownToken("foo".to_string()));
    assert_eq!(remaining, vec![1, 2]);
}

#[test]
fn adding_two_addresses_is_a_type_mismatch() {
    let mut session = quiet_session();
    let error = session.feed("here here +").unwrap_err();

    assert!(matches!(error.kind(), ErrorKind::TypeMismatch { .. }));
}

#[test_case("2 3 + .", "5 "; "dot prints and pops")]
#[test_case("0 0= .", "-1 "; "zero is true")]
#[test_case("5 0= .", "0 "; "five is false")]
#[test_case("65 emit 321 emit", "AA"; "emit writes the low byte")]
#[test_case("1 2 .s", "<2> 1 2 "; "dot s")]
#[test_case(".s", "<0> "; "dot s on empty")]
#[test_case("42 . cr", "42 \n"; "cr")]
#[test_case("1 2 sp@ .", "@2 "; "sp fetch")]
#[test_case("rp@ .", "@0 "; "rp fetch")]
#[test_case("here . 3 allot here .", "@0 @3 "; "allot moves here")]
#[test_case("here 2 + .", "@2 "; "address offset")]
fn primitive_output(source: &str, expected: &str) {
    assert_eq!(eval_and_output(source), expected);
}

#[test]
fn dot_leaves_the_stack_empty() {
    let mut session = quiet_session();
    session.feed("3 4 + .").unwrap();

    assert_eq!(session.take_output(), "7 ");
    assert!(session.image().data.is_empty());
}

#[test]
fn key_reads_the_session_input() {
    let mut session = quiet_session().with_input(ScriptedInput::from_text("hi"));

    session.feed("key key key . . .").unwrap();
    assert_eq!(session.take_output(), "-1 105 104 ");
}

#[test]
fn allot_can_not_leave_memory() {
    let mut session = quiet_session();

    assert!(matches!(
        session.feed("-1 allot").unwrap_err().kind(),
        ErrorKind::InvalidAddress(_)
    ));
    assert!(matches!(
        session.feed("5000 allot").unwrap_err().kind(),
        ErrorKind::InvalidAddress(_)
    ));
}

#[test]
fn data_stack_overflow_is_reported() {
    let config = Config {
        report: ReportStyle::Quiet,
        data_capacity: 2,
        ..Config::default()
    };
    let mut session = Session::start(config, None).unwrap();

    let error = session.feed("1 2 3").unwrap_err();
    assert_eq!(error.kind(), &ErrorKind::StackOverflow("Data"));
    assert_eq!(ints(&session), vec![1, 2]);
}
