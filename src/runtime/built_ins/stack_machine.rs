use crate::runtime::{
    built_ins::primitives::Primitive,
    combinators::term::Term,
    data_structures::{cell::Cell, dictionary::WordBody, memory_image::MemoryImage},
    error::{self, ErrorKind, machine_error},
    interpreter::Machine,
};

/// Run a stack machine primitive.  `exit` and the syntax words need the evaluator's control
/// state and are run by it directly.
pub fn execute(primitive: Primitive, machine: &mut dyn Machine) -> error::Result<()> {
    match primitive {
        Primitive::Fetch => word_fetch(machine),
        Primitive::Store => word_store(machine),
        Primitive::SpFetch => word_sp_fetch(machine),
        Primitive::RpFetch => word_rp_fetch(machine),
        Primitive::ZeroEquals => word_zero_equals(machine),
        Primitive::Add => word_add(machine),
        Primitive::Nand => integer_op(machine, |a, b| Ok(!(a & b))),
        Primitive::Key => word_key(machine),
        Primitive::Emit => word_emit(machine),

        Primitive::Dup => word_dup(machine),
        Primitive::Drop => word_drop(machine),
        Primitive::Swap => word_swap(machine),
        Primitive::Over => word_over(machine),
        Primitive::Rot => word_rot(machine),
        Primitive::Depth => word_depth(machine),
        Primitive::Pick => word_pick(machine),

        Primitive::Subtract => integer_op(machine, |a, b| Ok(a.wrapping_sub(b))),
        Primitive::Multiply => integer_op(machine, |a, b| Ok(a.wrapping_mul(b))),
        Primitive::Divide => integer_op(machine, |a, b| match b {
            0 => machine_error(ErrorKind::DivisionByZero),
            _ => Ok(a.wrapping_div(b)),
        }),
        Primitive::Modulo => integer_op(machine, |a, b| match b {
            0 => machine_error(ErrorKind::DivisionByZero),
            _ => Ok(a.wrapping_rem(b)),
        }),
        Primitive::And => integer_op(machine, |a, b| Ok(a & b)),
        Primitive::Or => integer_op(machine, |a, b| Ok(a | b)),
        Primitive::Xor => integer_op(machine, |a, b| Ok(a ^ b)),
        Primitive::Invert => word_invert(machine),
        Primitive::Less => integer_op(machine, |a, b| Ok(flag(a < b))),
        Primitive::Greater => integer_op(machine, |a, b| Ok(flag(a > b))),
        Primitive::Equal => word_equal(machine),
        Primitive::NotEqual => word_not_equal(machine),
        Primitive::LessEqual => integer_op(machine, |a, b| Ok(flag(a <= b))),
        Primitive::GreaterEqual => integer_op(machine, |a, b| Ok(flag(a >= b))),
        Primitive::ShiftLeft => integer_op(machine, |a, n| Ok(shift(a, n, u64::checked_shl))),
        Primitive::ShiftRight => integer_op(machine, |a, n| Ok(shift(a, n, u64::checked_shr))),

        Primitive::ToR => word_to_r(machine),
        Primitive::RFrom => word_r_from(machine),
        Primitive::RDrop => word_r_drop(machine),

        Primitive::Dot => word_dot(machine),
        Primitive::DotS => word_dot_s(machine),
        Primitive::Cr => machine.write(b"\n"),
        Primitive::Here => word_here(machine),
        Primitive::Allot => word_allot(machine),

        Primitive::Apply => word_apply(machine),
        Primitive::TermFrom => word_term_from(machine),
        Primitive::DotC => word_dot_c(machine),
        Primitive::Words => word_words(machine),
        Primitive::Comma => word_comma(machine),

        Primitive::Exit
        | Primitive::Lit
        | Primitive::Branch
        | Primitive::ZeroBranch
        | Primitive::Execute
        | Primitive::Colon
        | Primitive::Semicolon
        | Primitive::Forget
        | Primitive::Immutable
        | Primitive::Immediate
        | Primitive::Tick
        | Primitive::LeftBracket
        | Primitive::RightBracket
        | Primitive::Alias
        | Primitive::Bird
        | Primitive::Combinators
        | Primitive::Bye => machine_error(ErrorKind::InvalidWordUse {
            word: primitive.name().to_string(),
            reason: "it is not a stack machine operation".to_string(),
        }),
    }
}

fn flag(value: bool) -> i64 {
    if value { -1 } else { 0 }
}

/// Shift the bits of `value`, counts outside 0 to 63 shift everything out.
fn shift(value: i64, count: i64, op: fn(u64, u32) -> Option<u64>) -> i64 {
    u32::try_from(count)
        .ok()
        .and_then(|count| op(value as u64, count))
        .map_or(0, |bits| bits as i64)
}

/// Pop two integers, push the result of combining them.
///
/// Signature: `a b -- c`
fn integer_op(
    machine: &mut dyn Machine,
    op: impl FnOnce(i64, i64) -> error::Result<i64>,
) -> error::Result<()> {
    let b = machine.pop_as_int()?;
    let a = machine.pop_as_int()?;

    machine.push(Cell::Int(op(a, b)?))
}

/// Read the cell stored at an address.
///
/// Signature: `addr -- x`
fn word_fetch(machine: &mut dyn Machine) -> error::Result<()> {
    let address = machine.pop_as_address()?;
    let value = machine.image().read(address)?;

    machine.push(value)
}

/// Write a cell to an address.
///
/// Signature: `x addr --`
fn word_store(machine: &mut dyn Machine) -> error::Result<()> {
    let address = machine.pop_as_address()?;
    let value = machine.pop()?;

    machine.image_mut().write(address, value)
}

/// Signature: `-- sp`
fn word_sp_fetch(machine: &mut dyn Machine) -> error::Result<()> {
    let depth = machine.image().data.len();
    machine.push(Cell::Address(depth))
}

/// Signature: `-- rp`
fn word_rp_fetch(machine: &mut dyn Machine) -> error::Result<()> {
    let depth = machine.image().returns.len();
    machine.push(Cell::Address(depth))
}

/// True only for the integer zero, every other cell is false.
///
/// Signature: `x -- flag`
fn word_zero_equals(machine: &mut dyn Machine) -> error::Result<()> {
    let value = machine.pop()?;
    machine.push(Cell::truth(value.is_zero()))
}

/// Add two integers, or offset an address by an integer.
///
/// Signature: `x y -- z`
fn word_add(machine: &mut dyn Machine) -> error::Result<()> {
    let b = machine.pop()?;
    let a = machine.pop()?;

    let sum = match (&a, &b) {
        (Cell::Int(a), Cell::Int(b)) => Cell::Int(a.wrapping_add(*b)),
        (Cell::Address(address), Cell::Int(offset)) | (Cell::Int(offset), Cell::Address(address)) => {
            let target = *address as i128 + *offset as i128;

            match usize::try_from(target) {
                Ok(target) => Cell::Address(target),
                Err(_) => {
                    return machine_error(ErrorKind::InvalidAddress(
                        i64::try_from(target).unwrap_or(i64::MIN),
                    ));
                }
            }
        }
        (Cell::Int(_), other) | (other, _) => {
            return machine_error(ErrorKind::mismatch("integer", other.kind_name()));
        }
    };

    machine.push(sum)
}

/// Read one character, -1 at the end of input.
///
/// Signature: `-- x`
fn word_key(machine: &mut dyn Machine) -> error::Result<()> {
    let value = match machine.read_char()? {
        Some(next) => next as i64,
        None => -1,
    };

    machine.push(Cell::Int(value))
}

/// Write the low byte of an integer.
///
/// Signature: `x --`
fn word_emit(machine: &mut dyn Machine) -> error::Result<()> {
    let value = machine.pop_as_int()?;
    machine.write(&[(value & 0xff) as u8])
}

/// Duplicate the top value on the data stack.
///
/// Signature: `a -- a a`
fn word_dup(machine: &mut dyn Machine) -> error::Result<()> {
    let value = machine.pop()?;

    machine.push(value.clone())?;
    machine.push(value)
}

/// Signature: `a --`
fn word_drop(machine: &mut dyn Machine) -> error::Result<()> {
    let _ = machine.pop()?;
    Ok(())
}

/// Swap the top 2 values on the data stack.
///
/// Signature: `a b -- b a`
fn word_swap(machine: &mut dyn Machine) -> error::Result<()> {
    let b = machine.pop()?;
    let a = machine.pop()?;

    machine.push(b)?;
    machine.push(a)
}

/// Signature: `a b -- a b a`
fn word_over(machine: &mut dyn Machine) -> error::Result<()> {
    let b = machine.pop()?;
    let a = machine.pop()?;

    machine.push(a.clone())?;
    machine.push(b)?;
    machine.push(a)
}

/// Rotate the third value to the top.
///
/// Signature: `a b c -- b c a`
fn word_rot(machine: &mut dyn Machine) -> error::Result<()> {
    let c = machine.pop()?;
    let b = machine.pop()?;
    let a = machine.pop()?;

    machine.push(b)?;
    machine.push(c)?;
    machine.push(a)
}

/// Get the depth of the data stack before calling this word.
///
/// Signature: `-- depth`
fn word_depth(machine: &mut dyn Machine) -> error::Result<()> {
    let depth = machine.image().data.len() as i64;
    machine.push(Cell::Int(depth))
}

/// Copy the value at the given index, 0 being the value under the index.
///
/// Signature: `index -- picked-value`
fn word_pick(machine: &mut dyn Machine) -> error::Result<()> {
    let index = machine.pop_as_int()?;

    if index < 0 {
        return machine_error(ErrorKind::StackUnderflow);
    }

    let value = machine.image().data.pick(index as usize)?;
    machine.push(value)
}

/// Signature: `x -- y`
fn word_invert(machine: &mut dyn Machine) -> error::Result<()> {
    let value = machine.pop_as_int()?;
    machine.push(Cell::Int(!value))
}

/// Compare any two cells for identity.
///
/// Signature: `x y -- flag`
fn word_equal(machine: &mut dyn Machine) -> error::Result<()> {
    let b = machine.pop()?;
    let a = machine.pop()?;

    machine.push(Cell::truth(a == b))
}

/// Signature: `x y -- flag`
fn word_not_equal(machine: &mut dyn Machine) -> error::Result<()> {
    let b = machine.pop()?;
    let a = machine.pop()?;

    machine.push(Cell::truth(a != b))
}

/// Signature: `x -- r:x`
fn word_to_r(machine: &mut dyn Machine) -> error::Result<()> {
    let value = machine.pop()?;
    machine.image_mut().returns.push(value)
}

/// Signature: `r:x -- x`
fn word_r_from(machine: &mut dyn Machine) -> error::Result<()> {
    let value = match machine.image_mut().returns.pop() {
        Ok(value) => value,
        Err(_) => return machine_error(ErrorKind::ReturnStackEmpty),
    };

    machine.push(value)
}

/// Signature: `r:x --`
fn word_r_drop(machine: &mut dyn Machine) -> error::Result<()> {
    match machine.image_mut().returns.pop() {
        Ok(_) => Ok(()),
        Err(_) => machine_error(ErrorKind::ReturnStackEmpty),
    }
}

/// Print a cell followed by a space.
///
/// Signature: `x --`
fn word_dot(machine: &mut dyn Machine) -> error::Result<()> {
    let value = machine.pop()?;
    machine.write(format!("{} ", value).as_bytes())
}

/// Print the depth of the data stack and its values, bottom first.
///
/// Signature: `--`
fn word_dot_s(machine: &mut dyn Machine) -> error::Result<()> {
    let text = render_data_stack(machine.image());
    machine.write(text.as_bytes())
}

/// Render the data stack the way `.s` prints it, `<depth> ` then every cell and a space.
pub fn render_data_stack(image: &MemoryImage) -> String {
    let data = &image.data;
    let mut text = format!("<{}> ", data.len());

    for cell in data.items() {
        text += &format!("{} ", cell);
    }

    text
}

/// Render the continuation stack the way `.c` prints it, bottom first separated by ` | `.
pub fn render_continuations(image: &MemoryImage) -> String {
    let continuations = &image.continuations;
    let entries: Vec<String> = continuations
        .items()
        .iter()
        .map(|entry| entry.to_string())
        .collect();

    format!("<{}> {}", continuations.len(), entries.join(" | "))
}

/// Signature: `-- addr`
fn word_here(machine: &mut dyn Machine) -> error::Result<()> {
    let here = machine.image().here();
    machine.push(Cell::Address(here))
}

/// Signature: `n --`
fn word_allot(machine: &mut dyn Machine) -> error::Result<()> {
    let count = machine.pop_as_int()?;
    machine.image_mut().allot(count)
}

/// Deliver a cell to the reducer.  A reference to a combinator or term word delivers the term.
///
/// Signature: `x --`
fn word_apply(machine: &mut dyn Machine) -> error::Result<()> {
    let cell = machine.pop()?;

    let value = match &cell {
        Cell::WordRef(reference) => match &machine.image().dictionary.word(reference.id)?.body {
            WordBody::Combinator(combinator) => Term::combinator(*combinator),
            WordBody::Term(term) => term.clone(),
            WordBody::Primitive(_) | WordBody::Composed { .. } => Term::atom(cell.clone()),
        },
        _ => Term::atom(cell.clone()),
    };

    machine.deliver(value)
}

/// Signature: `-- x`
fn word_term_from(machine: &mut dyn Machine) -> error::Result<()> {
    let cell = machine.take_bare_combinator()?;
    machine.push(cell)
}

/// Signature: `--`
fn word_dot_c(machine: &mut dyn Machine) -> error::Result<()> {
    let text = render_continuations(machine.image());
    machine.write(text.as_bytes())
}

/// Signature: `--`
fn word_words(machine: &mut dyn Machine) -> error::Result<()> {
    let listing = machine.image().dictionary.to_string();
    machine.write(listing.as_bytes())
}

/// Append a cell to the definition being compiled.  With no definition open the cell is laid into
/// memory at `here` instead.
///
/// Signature: `x --`
fn word_comma(machine: &mut dyn Machine) -> error::Result<()> {
    let value = machine.pop()?;
    let image = machine.image_mut();

    match &mut image.compiling {
        Some(definition) => {
            definition.body.push(value);
            Ok(())
        }
        None => image.compile(&[value]).map(|_| ()),
    }
}
