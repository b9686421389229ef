use crate::{
    lang::source_buffer::SourceLocation,
    runtime::{
        built_ins::primitives::Primitive,
        combinators::{
            Combinator,
            continuation::{Continuation, ContinuationFrame, Origin},
            term::Term,
        },
        data_structures::{
            cell::{Cell, WordId},
            dictionary::{Partition, StackEffect, Word, WordBody},
            memory_image::{Definition, Fuel, Limits, MemoryImage, Mode},
        },
        error::{self, ErrorKind, machine_error},
    },
};
use std::{fmt::Write, rc::Rc};
use tracing::debug;

/// The first line of every dump.
pub const HEADER: &str = "yeast-image 2";

/// Render an image as canonical text.  One line per setting, per run of non-zero memory and per
/// word, then one line per stack with cells bottom to top.
pub fn dump(image: &MemoryImage) -> String {
    let mut text = String::new();
    let limits = image.limits();

    // Writing to a String can not fail.
    let _ = writeln!(text, "{}", HEADER);
    let _ = writeln!(
        text,
        "limits {} {} {} {}",
        limits.memory, limits.data, limits.returns, limits.continuations
    );
    let _ = writeln!(text, "mode {}", image.mode.name());
    let _ = writeln!(text, "fuel {} {}", image.fuel.remaining(), image.fuel.budget());
    let _ = writeln!(text, "here {}", image.here());

    match image.dictionary.last_defined() {
        Some(id) => {
            let _ = writeln!(text, "last {}", id);
        }
        None => {
            let _ = writeln!(text, "last none");
        }
    }

    for (start, run) in memory_runs(image.memory()) {
        let _ = writeln!(text, "memory {}{}", start, cell_list(run));
    }

    for word in image.dictionary.words() {
        let bound = if image.dictionary.is_bound(word.id) {
            "bound"
        } else {
            "hidden"
        };

        let body = match &word.body {
            WordBody::Primitive(primitive) => format!("prim {}", primitive.name()),
            WordBody::Combinator(combinator) => format!("comb {}", combinator.symbol()),
            WordBody::Composed { entry, len } => format!("code {} {}", entry, len),
            WordBody::Term(term) => format!("term {}", term),
        };

        let immediate = if word.immediate { "immediate" } else { "plain" };

        let _ = writeln!(
            text,
            "word {} {} {} {} {} {} {}",
            word.id,
            word.name,
            effect_token(word.effect),
            word.flag(),
            bound,
            immediate,
            body
        );
    }

    let _ = writeln!(text, "data{}", cell_list(image.data.items()));
    let _ = writeln!(text, "return{}", cell_list(image.returns.items()));

    let entries: Vec<String> = image
        .continuations
        .items()
        .iter()
        .map(|entry| entry.to_string())
        .collect();

    if entries.is_empty() {
        let _ = writeln!(text, "cont");
    } else {
        let _ = writeln!(text, "cont {}", entries.join(" | "));
    }

    if let Some(definition) = &image.compiling {
        let state = if definition.suspended { "suspended" } else { "open" };

        let _ = writeln!(
            text,
            "compiling {} {}{}",
            definition.name,
            state,
            cell_list(&definition.body)
        );
    }

    debug!(words = image.dictionary.words().len(), "Dumped image.");

    text
}

/// `inputs:outputs` for fixed effects, `Nargs` for combinators and `*` for variadic words.
fn effect_token(effect: StackEffect) -> String {
    match effect {
        StackEffect::Fixed { inputs, outputs } => format!("{}:{}", inputs, outputs),
        StackEffect::Combinator { arity } => format!("{}args", arity),
        StackEffect::Variadic => "*".to_string(),
    }
}

fn parse_effect(line: usize, token: &str) -> error::Result<StackEffect> {
    if token == "*" {
        return Ok(StackEffect::Variadic);
    }

    if let Some(arity) = token.strip_suffix("args") {
        return Ok(StackEffect::Combinator {
            arity: number(line, arity)?,
        });
    }

    let Some((inputs, outputs)) = token.split_once(':') else {
        return machine_error(ErrorKind::malformed(
            line,
            format!("{} is not a stack effect", token),
        ));
    };

    Ok(StackEffect::Fixed {
        inputs: number(line, inputs)?,
        outputs: number(line, outputs)?,
    })
}

fn cell_list(cells: &[Cell]) -> String {
    cells.iter().map(|cell| format!(" {}", cell)).collect()
}

/// Split memory into runs of cells that are not the default zero.
fn memory_runs(memory: &[Cell]) -> Vec<(usize, &[Cell])> {
    let mut runs = Vec::new();
    let mut start = None;

    for (address, cell) in memory.iter().enumerate() {
        match (cell.is_zero(), start) {
            (false, None) => start = Some(address),
            (true, Some(first)) => {
                runs.push((first, &memory[first..address]));
                start = None;
            }
            _ => {}
        }
    }

    if let Some(first) = start {
        runs.push((first, &memory[first..]));
    }

    runs
}

/// A word line before it has been checked against memory.
struct WordLine {
    line: usize,
    id: WordId,
    name: String,
    effect: StackEffect,
    partition: Partition,
    mutable: bool,
    bound: bool,
    immediate: bool,
    body: WordBody,
}

/// Everything read from a dump, before it is assembled into an image.
#[derive(Default)]
struct Parsed {
    limits: Option<(usize, Limits)>,
    mode: Option<Mode>,
    fuel: Option<Fuel>,
    here: Option<(usize, usize)>,
    last: Option<(usize, Option<WordId>)>,
    memory: Vec<(usize, usize, Vec<Cell>)>,
    words: Vec<WordLine>,
    data: Option<(usize, Vec<Cell>)>,
    returns: Option<(usize, Vec<Cell>)>,
    continuations: Option<(usize, Vec<Continuation>)>,
    compiling: Option<(usize, Definition)>,
}

/// Build an image from dump text.  Any line that does not match the grammar, and any reference
/// that does not resolve, fails `MalformedDump`.
pub fn load(text: &str, permit_shadowing: bool) -> error::Result<MemoryImage> {
    let parsed = parse(text)?;

    let Some((limits_line, limits)) = parsed.limits else {
        return machine_error(ErrorKind::malformed(0, "missing limits line"));
    };

    if !limits.within_max() {
        return machine_error(ErrorKind::malformed(
            limits_line,
            format!("stores are limited to {} cells", Limits::MAX),
        ));
    }

    let (Some(mode), Some(fuel), Some((here_line, here))) = (parsed.mode, parsed.fuel, parsed.here)
    else {
        return machine_error(ErrorKind::malformed(0, "missing mode, fuel or here line"));
    };

    let mut image = MemoryImage::empty(limits, permit_shadowing, fuel, mode);

    for (line, start, cells) in &parsed.memory {
        for (offset, cell) in cells.iter().enumerate() {
            image
                .write(start.checked_add(offset).unwrap_or(usize::MAX), cell.clone())
                .map_err(|_| ErrorKind::malformed(*line, "memory run past the end of memory"))?;
        }
    }

    image
        .set_here(here)
        .map_err(|_| ErrorKind::malformed(here_line, "here is past the end of memory"))?;

    for word_line in parsed.words {
        restore_word(&mut image, word_line)?;
    }

    image.dictionary.seal();

    if let Some((line, last)) = parsed.last {
        image.dictionary.restore_last_defined(last, line)?;
    }

    for (line, _, cells) in &parsed.memory {
        check_cells(&image, *line, cells)?;
    }

    if let Some((line, cells)) = parsed.data {
        check_cells(&image, line, &cells)?;
        image
            .data
            .replace(cells)
            .map_err(|_| ErrorKind::malformed(line, "data stack over capacity"))?;
    }

    if let Some((line, cells)) = parsed.returns {
        check_cells(&image, line, &cells)?;
        image
            .returns
            .replace(cells)
            .map_err(|_| ErrorKind::malformed(line, "return stack over capacity"))?;
    }

    if let Some((line, entries)) = parsed.continuations {
        for entry in &entries {
            let terms: Vec<&Rc<Term>> = match entry {
                Continuation::Operator { .. } => Vec::new(),
                Continuation::Frame(frame) => frame.collected.iter().collect(),
                Continuation::Group { items, .. } => items.iter().collect(),
            };

            for term in terms {
                check_cells(&image, line, &term_cells(term))?;
            }
        }

        image
            .continuations
            .replace(entries)
            .map_err(|_| ErrorKind::malformed(line, "continuation stack over capacity"))?;
    }

    if let Some((line, definition)) = parsed.compiling {
        check_cells(&image, line, &definition.body)?;
        image.compiling = Some(definition);
    }

    debug!(words = image.dictionary.words().len(), "Loaded image.");

    Ok(image)
}

fn parse(text: &str) -> error::Result<Parsed> {
    let mut parsed = Parsed::default();
    let mut seen_header = false;

    for (index, raw) in text.lines().enumerate() {
        let line = index + 1;
        let content = raw.trim();

        if content.is_empty() || content.starts_with('#') {
            continue;
        }

        if !seen_header {
            if content != HEADER {
                return machine_error(ErrorKind::malformed(line, "expected the yeast-image header"));
            }

            seen_header = true;
            continue;
        }

        let mut tokens = content.split_whitespace();
        let keyword = tokens.next().unwrap_or_default();
        let rest: Vec<&str> = tokens.collect();

        match keyword {
            "limits" => {
                let values = numbers(line, &rest, 4)?;
                let limits = Limits {
                    memory: values[0],
                    data: values[1],
                    returns: values[2],
                    continuations: values[3],
                };

                set_once(&mut parsed.limits, (line, limits), line, keyword)?;
            }
            "mode" => {
                let mode = match rest.as_slice() {
                    [name] => Mode::from_name(name),
                    _ => None,
                };

                let Some(mode) = mode else {
                    return machine_error(ErrorKind::malformed(line, "expected forth or combinator"));
                };

                set_once(&mut parsed.mode, mode, line, keyword)?;
            }
            "fuel" => {
                let values = numbers(line, &rest, 2)?;
                let (remaining, budget) = (values[0] as u64, values[1] as u64);

                if remaining > budget {
                    return machine_error(ErrorKind::malformed(line, "more fuel left than budgeted"));
                }

                set_once(&mut parsed.fuel, Fuel::restored(remaining, budget), line, keyword)?;
            }
            "here" => {
                let values = numbers(line, &rest, 1)?;
                set_once(&mut parsed.here, (line, values[0]), line, keyword)?;
            }
            "last" => {
                let last = match rest.as_slice() {
                    ["none"] => None,
                    [id] => Some(WordId(number(line, id)?)),
                    _ => {
                        return machine_error(ErrorKind::malformed(line, "expected an id or none"));
                    }
                };

                set_once(&mut parsed.last, (line, last), line, keyword)?;
            }
            "memory" => {
                let Some((start, cells)) = rest.split_first() else {
                    return machine_error(ErrorKind::malformed(line, "expected a start address"));
                };

                let start = number(line, start)?;
                parsed.memory.push((line, start, cells_of(line, cells)?));
            }
            "word" => parsed.words.push(parse_word(line, &rest)?),
            "data" => set_once(&mut parsed.data, (line, cells_of(line, &rest)?), line, keyword)?,
            "return" => {
                set_once(&mut parsed.returns, (line, cells_of(line, &rest)?), line, keyword)?
            }
            "cont" => {
                let entries = parse_continuations(line, &rest)?;
                set_once(&mut parsed.continuations, (line, entries), line, keyword)?;
            }
            "compiling" => {
                let [name, state, cells @ ..] = rest.as_slice() else {
                    return machine_error(ErrorKind::malformed(line, "expected a name and a state"));
                };

                let suspended = match *state {
                    "open" => false,
                    "suspended" => true,
                    other => {
                        return machine_error(ErrorKind::malformed(
                            line,
                            format!("unknown definition state {}", other),
                        ));
                    }
                };

                let definition = Definition {
                    name: name.to_string(),
                    body: cells_of(line, cells)?,
                    suspended,
                };

                set_once(&mut parsed.compiling, (line, definition), line, keyword)?;
            }
            other => {
                return machine_error(ErrorKind::malformed(line, format!("unknown line {}", other)));
            }
        }
    }

    if !seen_header {
        return machine_error(ErrorKind::malformed(0, "empty dump"));
    }

    Ok(parsed)
}

fn set_once<T>(slot: &mut Option<T>, value: T, line: usize, keyword: &str) -> error::Result<()> {
    if slot.is_some() {
        return machine_error(ErrorKind::malformed(line, format!("second {} line", keyword)));
    }

    *slot = Some(value);
    Ok(())
}

fn number(line: usize, text: &str) -> error::Result<usize> {
    if !text.chars().all(|c| c.is_ascii_digit()) {
        return machine_error(ErrorKind::malformed(line, format!("{} is not a number", text)));
    }

    match text.parse() {
        Ok(value) => Ok(value),
        Err(_) => machine_error(ErrorKind::malformed(line, format!("{} is not a number", text))),
    }
}

fn numbers(line: usize, tokens: &[&str], count: usize) -> error::Result<Vec<usize>> {
    if tokens.len() != count {
        return machine_error(ErrorKind::malformed(line, format!("expected {} numbers", count)));
    }

    tokens.iter().map(|token| number(line, token)).collect()
}

fn cells_of(line: usize, tokens: &[&str]) -> error::Result<Vec<Cell>> {
    tokens
        .iter()
        .map(|token| match Cell::parse_literal(token) {
            Some(cell) => Ok(cell),
            None => machine_error(ErrorKind::malformed(line, format!("{} is not a cell", token))),
        })
        .collect()
}

fn parse_word(line: usize, tokens: &[&str]) -> error::Result<WordLine> {
    let [id, name, effect, flag, bound, immediate, kind, body @ ..] = tokens else {
        return machine_error(ErrorKind::malformed(line, "incomplete word line"));
    };

    let effect = parse_effect(line, effect)?;

    let (partition, mutable) = match *flag {
        "core" => (Partition::Core, false),
        "mutable" => (Partition::User, true),
        "immutable" => (Partition::User, false),
        other => return machine_error(ErrorKind::malformed(line, format!("unknown flag {}", other))),
    };

    let bound = match *bound {
        "bound" => true,
        "hidden" => false,
        other => {
            return machine_error(ErrorKind::malformed(line, format!("unknown binding {}", other)));
        }
    };

    let immediate = match *immediate {
        "immediate" => true,
        "plain" => false,
        other => {
            return machine_error(ErrorKind::malformed(line, format!("unknown mark {}", other)));
        }
    };

    let body = match (*kind, body) {
        ("prim", [primitive]) => match Primitive::from_name(primitive) {
            Some(primitive) => WordBody::Primitive(primitive),
            None => {
                return machine_error(ErrorKind::malformed(
                    line,
                    format!("unknown primitive {}", primitive),
                ));
            }
        },
        ("comb", [symbol]) => {
            let mut chars = symbol.chars();

            match (chars.next().and_then(Combinator::from_symbol), chars.next()) {
                (Some(combinator), None) => WordBody::Combinator(combinator),
                _ => {
                    return machine_error(ErrorKind::malformed(
                        line,
                        format!("unknown combinator {}", symbol),
                    ));
                }
            }
        }
        ("code", [entry, len]) => WordBody::Composed {
            entry: number(line, entry)?,
            len: number(line, len)?,
        },
        ("term", terms) => match Term::parse_exact(terms.iter().copied()) {
            Some(term) => WordBody::Term(term),
            None => return machine_error(ErrorKind::malformed(line, "bad term")),
        },
        (kind, _) => {
            return machine_error(ErrorKind::malformed(line, format!("bad {} body", kind)));
        }
    };

    Ok(WordLine {
        line,
        id: WordId(number(line, id)?),
        name: name.to_string(),
        effect,
        partition,
        mutable,
        bound,
        immediate,
        body,
    })
}

fn parse_continuations(line: usize, tokens: &[&str]) -> error::Result<Vec<Continuation>> {
    if tokens.is_empty() {
        return Ok(Vec::new());
    }

    tokens
        .split(|token| *token == "|")
        .map(|entry| parse_continuation(line, entry))
        .collect()
}

fn parse_continuation(line: usize, tokens: &[&str]) -> error::Result<Continuation> {
    let bad = |reason: &str| machine_error(ErrorKind::malformed(line, reason.to_string()));

    let [kind, origin, rest @ ..] = tokens else {
        return bad("incomplete continuation entry");
    };

    let Some(origin) = Origin::from_name(origin) else {
        return bad("unknown origin");
    };

    match (*kind, rest) {
        ("operator", []) => Ok(Continuation::Operator { origin }),
        ("frame", [symbol, terms @ ..]) => {
            let mut chars = symbol.chars();

            let combinator = match (chars.next().and_then(Combinator::from_symbol), chars.next()) {
                (Some(combinator), None) => combinator,
                _ => return bad("unknown combinator"),
            };

            let collected = parse_terms(line, terms)?;

            if collected.len() >= combinator.arity() {
                return bad("frame holds too many arguments");
            }

            Ok(Continuation::Frame(ContinuationFrame {
                combinator,
                collected,
                origin,
            }))
        }
        ("group", terms) => Ok(Continuation::Group {
            items: parse_terms(line, terms)?,
            origin,
        }),
        _ => bad("unknown continuation entry"),
    }
}

fn parse_terms(line: usize, tokens: &[&str]) -> error::Result<Vec<Rc<Term>>> {
    let mut tokens = tokens.iter().copied().peekable();
    let mut terms = Vec::new();

    while tokens.peek().is_some() {
        match Term::parse(&mut tokens) {
            Some(term) => terms.push(term),
            None => return machine_error(ErrorKind::malformed(line, "bad term")),
        }
    }

    Ok(terms)
}

/// Check a word line against what has been restored so far and add it to the dictionary.  The
/// effect of a composed word is taken as recorded, its code may have been written over since it
/// was compiled.  Every other kind of body fixes its own effect.
fn restore_word(image: &mut MemoryImage, word_line: WordLine) -> error::Result<()> {
    let line = word_line.line;

    let (effect, description) = match &word_line.body {
        WordBody::Primitive(primitive) => {
            (primitive.effect(), primitive.description().to_string())
        }
        WordBody::Combinator(combinator) => (
            StackEffect::Combinator {
                arity: combinator.arity(),
            },
            combinator.rule().to_string(),
        ),
        WordBody::Term(term) => (StackEffect::Variadic, term.to_string()),
        WordBody::Composed { entry, len } => {
            let end = entry.checked_add(*len);

            if *len == 0 || end.is_none_or(|end| end > image.size()) {
                return machine_error(ErrorKind::malformed(line, "code outside of memory"));
            }

            (word_line.effect, String::new())
        }
    };

    if effect != word_line.effect {
        return machine_error(ErrorKind::malformed(
            line,
            format!("{} does not have the recorded stack effect", word_line.name),
        ));
    }

    if word_line.immediate && word_line.partition == Partition::Core {
        return machine_error(ErrorKind::malformed(line, "core words are never immediate"));
    }

    let native = matches!(
        word_line.body,
        WordBody::Primitive(_) | WordBody::Combinator(_)
    );

    if word_line.partition == Partition::Core && !native {
        return machine_error(ErrorKind::malformed(line, "core words must be native"));
    }

    let word = Word {
        id: word_line.id,
        name: word_line.name,
        effect,
        body: word_line.body,
        partition: word_line.partition,
        mutable: word_line.mutable,
        immediate: word_line.immediate,
        description,
        location: SourceLocation::new_from_path("<dump>").at_line(line),
    };

    image.dictionary.restore_word(word, word_line.bound, line)
}

/// Every word reference has to name an existing word by its own name.
fn check_cells(image: &MemoryImage, line: usize, cells: &[Cell]) -> error::Result<()> {
    for cell in cells {
        if let Cell::WordRef(reference) = cell
            && !image.resolves(reference.id, &reference.name)
        {
            return machine_error(ErrorKind::malformed(
                line,
                format!("{} does not name a word", cell),
            ));
        }
    }

    Ok(())
}

fn term_cells(term: &Rc<Term>) -> Vec<Cell> {
    let mut cells = Vec::new();
    let mut pending: Vec<&Term> = vec![term.as_ref()];

    while let Some(term) = pending.pop() {
        match term {
            Term::Atom(cell) => cells.push(cell.clone()),
            Term::App(function, argument) => {
                pending.push(function.as_ref());
                pending.push(argument.as_ref());
            }
        }
    }

    cells
}
