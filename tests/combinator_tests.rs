// Tests for combinator mode: reading terms, partial application, fuel and the Forth bridge.

use test_case::test_case;
use yeast::config::Config;
use yeast::runtime::combinators::{Combinator, CombinatorBase};
use yeast::runtime::data_structures::cell::Cell;
use yeast::runtime::data_structures::memory_image::Mode;
use yeast::runtime::error::ErrorKind;
use yeast::runtime::session::{ReportStyle, Session};

fn session_with(config: Config) -> Session {
    let config = Config {
        report: ReportStyle::Quiet,
        ..config
    };

    Session::start(config, None).unwrap()
}

fn session() -> Session {
    session_with(Config::default())
}

fn data(session: &Session) -> Vec<String> {
    session
        .image()
        .data
        .items()
        .iter()
        .map(|cell| cell.to_string())
        .collect()
}

fn pending(session: &mut Session) -> String {
    if session.image().mode == Mode::Combinator {
        session.feed("#").unwrap();
    }

    session.feed(".c").unwrap();
    session.take_output()
}

#[test_case("combinators `ix#", &["?x"]; "identity")]
#[test_case("combinators ``kxy#", &["?x"]; "k keeps the first")]
#[test_case("combinators ``txk#", &[]; "t swaps into a function")]
#[test_case("combinators (kxy)#", &["?x"]; "group")]
#[test_case("combinators (k(ix)y)#", &["?x"]; "nested group")]
#[test_case("combinators ```cktx#", &["?x"]; "c flips")]
#[test_case("combinators ```bixz#", &[]; "b composes into a stuck term")]
#[test_case("combinators ` ` k x y#", &["?x"]; "whitespace is skipped")]
#[test_case("combinators ``kxy# 1 2 +", &["?x", "3"]; "hash returns to token mode")]
fn reduced_values(unit: &str, expected: &[&str]) {
    let mut session = session();
    let _ = session.feed(unit);

    assert_eq!(data(&session), expected);
}

#[test]
fn reduction_takes_one_step_per_firing() {
    let mut session = session_with(Config {
        fuel: 1,
        ..Config::default()
    });

    session.feed("combinators ``kxy#").unwrap();
    assert_eq!(data(&session), vec!["?x"]);

    assert!(matches!(
        session.feed("combinators ```skkx#").unwrap_err().kind(),
        ErrorKind::StepBudgetExceeded(1)
    ));
}

#[test]
fn skk_is_identity() {
    let mut session = session();

    session.feed("combinators ```skkx#").unwrap();
    assert_eq!(data(&session), vec!["?x"]);
}

#[test]
fn partial_frames_wait_across_units() {
    let mut session = session();

    session.feed("combinators `kx").unwrap();
    assert!(data(&session).is_empty());
    assert_eq!(session.image().continuations.len(), 1);

    session.feed("y").unwrap();
    assert_eq!(data(&session), vec!["?x"]);
    assert!(session.image().continuations.is_empty());
}

#[test]
fn pending_frames_print_with_their_arguments() {
    let mut session = session();

    session.feed("combinators `kx#").unwrap();
    assert_eq!(pending(&mut session), "<1> frame top k ?x");
}

#[test]
fn backtick_and_group_build_the_same_term() {
    let mut backtick = session();
    let mut group = session();

    backtick.feed("combinators ``bxy#").unwrap();
    group.feed("combinators (bxy)#").unwrap();

    assert_eq!(pending(&mut backtick), "<1> frame top b ?x ?y");
    assert_eq!(pending(&mut group), "<1> frame top b ?x ?y");
}

#[test]
fn self_application_runs_out_of_fuel() {
    let mut session = session_with(Config {
        fuel: 100,
        ..Config::default()
    });

    let error = session.feed("combinators ``sii``sii").unwrap_err();
    assert_eq!(error.kind(), &ErrorKind::StepBudgetExceeded(100));
}

#[test]
fn mm_runs_out_of_fuel_and_keeps_the_first_frame() {
    let mut session = session_with(Config {
        fuel: 50,
        ..Config::default()
    });

    let error = session.feed("combinators mm").unwrap_err();

    assert_eq!(error.kind(), &ErrorKind::StepBudgetExceeded(50));
    assert_eq!(pending(&mut session), "<1> frame top m");
}

#[test_case("combinators `xk", &[]; "atom in operator position")]
#[test_case("combinators ```sxyz", &[]; "stuck application")]
#[test_case("combinators `k)", &[]; "unmatched close")]
#[test_case("combinators ()", &[]; "empty group")]
#[test_case("combinators kx`y)", &["k ?x"]; "top level frames survive")]
fn arity_errors(unit: &str, frames: &[&str]) {
    let mut session = session();
    let error = session.feed(unit).unwrap_err();

    assert!(matches!(error.kind(), ErrorKind::ArityError(_)), "{}", error);

    let frames: Vec<String> = frames.iter().map(|frame| format!("frame top {}", frame)).collect();
    let entries: Vec<String> = session
        .image()
        .continuations
        .items()
        .iter()
        .map(|entry| entry.to_string())
        .collect();

    assert_eq!(entries, frames);
}

#[test]
fn the_base_decides_which_combinators_exist() {
    let mut session = session_with(Config {
        base: CombinatorBase::Ski,
        ..Config::default()
    });

    assert_eq!(
        session.feed("b").unwrap_err().kind(),
        &ErrorKind::UnknownToken("b".to_string())
    );

    session.feed("combinators b#").unwrap();
    assert_eq!(data(&session), vec!["?b"]);
}

#[test]
fn bird_defines_a_term_word() {
    let mut session = session();

    session.feed("bird q `ki").unwrap();
    session.feed("combinators ``qxy#").unwrap();

    assert_eq!(data(&session), vec!["?y"]);
}

#[test]
fn bird_terms_are_normalized_when_defined() {
    let mut session = session();

    session.feed("bird q ``skk").unwrap();
    session.feed("q .c").unwrap();

    assert_eq!(session.take_output(), "<1> frame top s <k> <k>");
}

#[test]
fn bird_rejects_incomplete_terms() {
    let mut session = session();

    assert!(matches!(
        session.feed("bird q ``sk").unwrap_err().kind(),
        ErrorKind::ArityError(_)
    ));
    assert!(session.image().dictionary.lookup("q").is_none());
}

#[test]
fn forth_values_can_be_applied() {
    let mut session = session();

    session.feed("k 5 apply 6 apply").unwrap();
    assert_eq!(data(&session), vec!["5"]);
}

#[test]
fn term_words_run_from_forth() {
    let mut session = session();

    session.feed("bird q `ki").unwrap();
    session.feed("q 5 apply 6 apply").unwrap();

    assert_eq!(data(&session), vec!["6"]);
}

#[test]
fn composed_words_can_apply_combinators() {
    let mut session = session();

    session.feed(": first k swap apply apply ;").unwrap();
    session.feed("1 2 first").unwrap();

    assert_eq!(data(&session), vec!["1"]);
}

#[test]
fn term_from_takes_a_bare_combinator() {
    let mut session = session();

    session.feed("k term>").unwrap();
    assert_eq!(session.image().data.items(), &[Cell::Combinator(Combinator::K)]);
    assert!(session.image().continuations.is_empty());

    session.feed("apply 7 apply 8 apply").unwrap();
    assert_eq!(data(&session), vec!["7"]);
}

#[test]
fn term_from_needs_a_bare_combinator() {
    let mut session = session();

    assert_eq!(
        session.feed("term>").unwrap_err().kind(),
        &ErrorKind::StackUnderflow
    );

    session.feed("k 1 apply").unwrap();
    assert!(matches!(
        session.feed("term>").unwrap_err().kind(),
        ErrorKind::ArityError(_)
    ));
}
