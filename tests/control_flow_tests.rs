// Tests for branches, literals, word references and compile time words.

use test_case::test_case;
use yeast::config::Config;
use yeast::runtime::data_structures::cell::Cell;
use yeast::runtime::error::ErrorKind;
use yeast::runtime::session::{ReportStyle, Session};

fn session() -> Session {
    let config = Config {
        report: ReportStyle::Quiet,
        ..Config::default()
    };

    Session::start(config, None).unwrap()
}

fn run(session: &mut Session, units: &[&str]) {
    for unit in units {
        session.feed(unit).unwrap();
    }
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

#[test]
fn branches_make_loops() {
    let mut session = session();

    run(
        &mut session,
        &[": countdown dup 0branch 6 dup . 1 - branch -9 drop ;", "3 countdown"],
    );

    assert_eq!(session.take_output(), "3 2 1 ");
    assert!(session.image().data.is_empty());
    assert!(session.image().returns.is_empty());
}

#[test]
fn zero_branch_falls_through_on_true() {
    let mut session = session();

    run(&mut session, &[": pick-one 0branch 2 10 exit 20 ;", "-1 pick-one 0 pick-one"]);
    assert_eq!(ints(&session), vec![10, 20]);
}

#[test]
fn endless_loops_run_out_of_fuel() {
    let mut session = session();
    session.feed(": forever branch -2 ;").unwrap();

    assert_eq!(
        session.feed("forever").unwrap_err().kind(),
        &ErrorKind::StepBudgetExceeded(Config::default().fuel)
    );
    assert!(session.image().returns.is_empty());
}

#[test_case(": bad branch -5 ;", ErrorKind::InvalidAddress(-3); "jump before memory")]
#[test_case(": bad branch dup ;", ErrorKind::mismatch("integer", "word"); "offset is not a number")]
#[test_case(": bad 0branch ;", ErrorKind::mismatch("integer", "word"); "offset is the exit")]
fn bad_branches(definition: &str, kind: ErrorKind) {
    let mut session = session();
    session.feed(definition).unwrap();

    let error = session.feed("0 bad").unwrap_err();
    assert_eq!(error.kind(), &kind, "{}", error);
}

#[test_case("branch"; "branch")]
#[test_case("0 0branch"; "zero branch")]
#[test_case("lit"; "lit")]
fn inline_words_only_run_in_definitions(unit: &str) {
    let mut session = session();

    assert!(matches!(
        session.feed(unit).unwrap_err().kind(),
        ErrorKind::InvalidWordUse { .. }
    ));
}

#[test]
fn tick_pushes_a_reference_that_execute_runs() {
    let mut session = session();

    run(&mut session, &["3 ' dup"]);
    assert!(matches!(session.image().data.items(), [Cell::Int(3), Cell::WordRef(_)]));

    run(&mut session, &["execute"]);
    assert_eq!(ints(&session), vec![3, 3]);
}

#[test]
fn tick_compiles_a_literal_reference() {
    let mut session = session();

    run(&mut session, &[": twice ' dup execute ;", "4 twice"]);
    assert_eq!(ints(&session), vec![4, 4]);
}

#[test]
fn execute_runs_composed_words() {
    let mut session = session();

    run(&mut session, &[": sq dup * ;", ": apply-sq ' sq execute 1 + ;", "5 apply-sq"]);
    assert_eq!(ints(&session), vec![26]);
}

#[test_case("5 execute", ErrorKind::mismatch("word", "integer"), &[Cell::Int(5)]; "not a word")]
#[test_case("execute", ErrorKind::StackUnderflow, &[]; "empty stack")]
#[test_case("' nothing", ErrorKind::UnknownToken("nothing".to_string()), &[]; "unknown name")]
fn reference_errors(unit: &str, kind: ErrorKind, remaining: &[Cell]) {
    let mut session = session();

    assert_eq!(session.feed(unit).unwrap_err().kind(), &kind);
    assert_eq!(session.image().data.items(), remaining);
}

#[test]
fn comma_lays_cells_at_here() {
    let mut session = session();

    run(&mut session, &["here 7 , @"]);

    assert_eq!(ints(&session), vec![7]);
    assert_eq!(session.image().here(), 1);
}

#[test]
fn brackets_run_tokens_inside_a_definition() {
    let mut session = session();

    run(&mut session, &[": five [ 2 3 + , ] ;", "five"]);
    assert_eq!(ints(&session), vec![5]);
}

#[test]
fn a_suspended_definition_waits_for_the_closing_bracket() {
    let mut session = session();

    run(&mut session, &[": six [ 6"]);

    assert!(matches!(
        session.feed(";").unwrap_err().kind(),
        ErrorKind::InvalidWordUse { .. }
    ));
    assert!(session.image().compiling.as_ref().is_some_and(|definition| definition.suspended));

    run(&mut session, &[", ] ;", "six"]);
    assert_eq!(ints(&session), vec![6]);
}

#[test]
fn immediate_words_run_while_compiling() {
    let mut session = session();

    run(&mut session, &[": seven-here 7 , ; immediate", ": seven seven-here ;"]);
    assert!(session.image().data.is_empty());

    run(&mut session, &["seven"]);
    assert_eq!(ints(&session), vec![7]);
}

#[test]
fn a_failing_immediate_word_discards_the_definition() {
    let mut session = session();

    run(&mut session, &[": boom drop ; immediate"]);

    assert_eq!(
        session.feed(": y boom ;").unwrap_err().kind(),
        &ErrorKind::StackUnderflow
    );
    assert!(session.image().compiling.is_none());
    assert!(session.image().dictionary.lookup("y").is_none());
}

#[test_case("]"; "close without a definition")]
#[test_case("["; "open without a definition")]
#[test_case(": a [ : b"; "colon inside a suspended definition")]
#[test_case("immediate"; "immediate without a definition")]
fn compile_time_word_errors(unit: &str) {
    let mut session = session();

    assert!(matches!(
        session.feed(unit).unwrap_err().kind(),
        ErrorKind::InvalidWordUse { .. }
    ));
}

#[test_case("<<", 1, 4, 16; "shift left")]
#[test_case("<<", 1, 64, 0; "shift left out of range")]
#[test_case(">>", -1, 60, 15; "shift right is logical")]
#[test_case(">>", 8, -1, 0; "negative shift")]
#[test_case("<=", 2, 2, -1; "less or equal")]
#[test_case(">=", 1, 2, 0; "greater or equal")]
#[test_case("<>", 1, 2, -1; "not equal")]
fn comparison_and_shift_words(word: &str, a: i64, b: i64, expected: i64) {
    let mut session = session();

    session.feed(&format!("{} {} {}", a, b, word)).unwrap();
    assert_eq!(ints(&session), vec![expected]);
}
