use crate::runtime::data_structures::dictionary::StackEffect;
use lazy_static::lazy_static;
use std::collections::HashMap;

/// Build the closed primitive table.  Every primitive gets its dictionary name, stack effect,
/// signature and description from one row, so the table can not drift from the enum.
macro_rules! primitive_table {
    ($( $variant:ident => $name:literal, $effect:expr, $kind:ident, $signature:literal,
        $description:literal; )*) => {
        /// The native operations of the stack machine.
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        pub enum Primitive {
            $( $variant, )*
        }

        impl Primitive {
            /// Every primitive, in boot order.
            pub const ALL: &'static [Primitive] = &[ $( Primitive::$variant, )* ];

            /// The name the primitive is bound to in the core dictionary.
            pub fn name(self) -> &'static str {
                match self {
                    $( Primitive::$variant => $name, )*
                }
            }

            pub fn effect(self) -> StackEffect {
                match self {
                    $( Primitive::$variant => $effect, )*
                }
            }

            pub fn kind(self) -> PrimitiveKind {
                match self {
                    $( Primitive::$variant => PrimitiveKind::$kind, )*
                }
            }

            /// The stack signature, for listings.
            pub fn signature(self) -> &'static str {
                match self {
                    $( Primitive::$variant => $signature, )*
                }
            }

            pub fn description(self) -> &'static str {
                match self {
                    $( Primitive::$variant => $description, )*
                }
            }
        }
    };
}

/// Whether a primitive can run anywhere, or only directly from the outer interpreter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PrimitiveKind {
    /// An ordinary stack machine operation.  It may be compiled into bodies.
    Machine,

    /// A word that reads the tokens after it, or changes how the rest of the input is read.  It
    /// can not be compiled into a body or run from threaded code.
    Syntax,
}

const fn fixed(inputs: usize, outputs: usize) -> StackEffect {
    StackEffect::Fixed { inputs, outputs }
}

const VARIADIC: StackEffect = StackEffect::Variadic;

primitive_table! {
    Fetch => "@", fixed(1, 1), Machine, "addr -- x",
        "Read the cell stored at an address.";
    Store => "!", fixed(2, 0), Machine, "x addr --",
        "Write a cell to an address.";
    SpFetch => "sp@", fixed(0, 1), Machine, "-- sp",
        "Push the depth of the data stack as an address.";
    RpFetch => "rp@", fixed(0, 1), Machine, "-- rp",
        "Push the depth of the return stack as an address.";
    ZeroEquals => "0=", fixed(1, 1), Machine, "x -- flag",
        "True if the value is the integer zero.";
    Add => "+", fixed(2, 1), Machine, "x y -- z",
        "Wrapping addition, or an address offset by an integer.";
    Nand => "nand", fixed(2, 1), Machine, "x y -- z",
        "Bitwise not-and of two integers.";
    Exit => "exit", fixed(0, 0), Machine, "r:addr --",
        "Resume at the address on top of the return stack.";
    Key => "key", fixed(0, 1), Machine, "-- x",
        "Read one character of input, -1 at the end of input.";
    Emit => "emit", fixed(1, 0), Machine, "x --",
        "Write the low byte of an integer to the output.";

    Dup => "dup", fixed(1, 2), Machine, "a -- a a",
        "Duplicate the top value.";
    Drop => "drop", fixed(1, 0), Machine, "a --",
        "Discard the top value.";
    Swap => "swap", fixed(2, 2), Machine, "a b -- b a",
        "Swap the top two values.";
    Over => "over", fixed(2, 3), Machine, "a b -- a b a",
        "Copy the second value over the top.";
    Rot => "rot", fixed(3, 3), Machine, "a b c -- b c a",
        "Rotate the third value to the top.";
    Depth => "depth", fixed(0, 1), Machine, "-- n",
        "Push the number of values on the data stack.";
    Pick => "pick", VARIADIC, Machine, "n -- x",
        "Copy the value n places below the top, 0 being the top.";

    Subtract => "-", fixed(2, 1), Machine, "x y -- z",
        "Wrapping subtraction.";
    Multiply => "*", fixed(2, 1), Machine, "x y -- z",
        "Wrapping multiplication.";
    Divide => "/", fixed(2, 1), Machine, "x y -- z",
        "Integer division, truncating toward zero.";
    Modulo => "mod", fixed(2, 1), Machine, "x y -- z",
        "Remainder of integer division.";
    And => "and", fixed(2, 1), Machine, "x y -- z",
        "Bitwise and.";
    Or => "or", fixed(2, 1), Machine, "x y -- z",
        "Bitwise or.";
    Xor => "xor", fixed(2, 1), Machine, "x y -- z",
        "Bitwise exclusive or.";
    Invert => "invert", fixed(1, 1), Machine, "x -- y",
        "Bitwise complement.";
    Less => "<", fixed(2, 1), Machine, "x y -- flag",
        "True if x is less than y.";
    Greater => ">", fixed(2, 1), Machine, "x y -- flag",
        "True if x is greater than y.";
    Equal => "=", fixed(2, 1), Machine, "x y -- flag",
        "True if the two cells are identical.";
    NotEqual => "<>", fixed(2, 1), Machine, "x y -- flag",
        "True if the two cells differ.";
    LessEqual => "<=", fixed(2, 1), Machine, "x y -- flag",
        "True if x is not greater than y.";
    GreaterEqual => ">=", fixed(2, 1), Machine, "x y -- flag",
        "True if x is not less than y.";
    ShiftLeft => "<<", fixed(2, 1), Machine, "x n -- y",
        "Shift left by n bits, 0 once n is outside 0 to 63.";
    ShiftRight => ">>", fixed(2, 1), Machine, "x n -- y",
        "Logical shift right by n bits, 0 once n is outside 0 to 63.";

    ToR => ">r", fixed(1, 0), Machine, "x -- r:x",
        "Move the top value to the return stack.";
    RFrom => "r>", fixed(0, 1), Machine, "r:x -- x",
        "Move the top of the return stack to the data stack.";
    RDrop => "rdrop", fixed(0, 0), Machine, "r:x --",
        "Discard the top of the return stack.";

    Dot => ".", fixed(1, 0), Machine, "x --",
        "Print a cell followed by a space.";
    DotS => ".s", fixed(0, 0), Machine, "--",
        "Print the data stack, bottom first.";
    Cr => "cr", fixed(0, 0), Machine, "--",
        "Print a new line.";
    Here => "here", fixed(0, 1), Machine, "-- addr",
        "Push the address of the next free memory cell.";
    Allot => "allot", fixed(1, 0), Machine, "n --",
        "Reserve n cells of memory, or release them if n is negative.";

    Apply => "apply", VARIADIC, Machine, "x --",
        "Deliver a cell to the combinator reducer as a top level value.";
    TermFrom => "term>", fixed(0, 1), Machine, "-- x",
        "Take a bare pending combinator back as a cell.";
    DotC => ".c", fixed(0, 0), Machine, "--",
        "Print the continuation stack, bottom first.";
    Words => "words", fixed(0, 0), Machine, "--",
        "List the bound words.";

    Lit => "lit", fixed(0, 1), Machine, "-- x",
        "Push the next cell of the definition instead of running it.";
    Branch => "branch", VARIADIC, Machine, "--",
        "Jump by the offset held in the next cell of the definition.";
    ZeroBranch => "0branch", VARIADIC, Machine, "flag --",
        "Jump by the offset held in the next cell if the flag is zero.";
    Execute => "execute", VARIADIC, Machine, "word --",
        "Run the word a reference points to.";
    Comma => ",", fixed(1, 0), Machine, "x --",
        "Append a cell to the open definition, or lay it into memory at here.";

    Colon => ":", fixed(0, 0), Syntax, "-- <name>",
        "Start compiling a new word.";
    Semicolon => ";", fixed(0, 0), Syntax, "--",
        "Finish the word being compiled.";
    Forget => "forget", fixed(0, 0), Syntax, "-- <name>",
        "Remove a mutable user word.";
    Immutable => "immutable", fixed(0, 0), Syntax, "--",
        "Seal the most recently defined word.";
    Immediate => "immediate", fixed(0, 0), Syntax, "--",
        "Make the most recently defined word run while compiling.";
    Tick => "'", fixed(0, 1), Syntax, "-- <name> word",
        "Push a reference to the next word, or compile one as a literal.";
    LeftBracket => "[", fixed(0, 0), Syntax, "--",
        "Run the following tokens while a definition stays open.";
    RightBracket => "]", fixed(0, 0), Syntax, "--",
        "Go back to compiling the open definition.";
    Alias => "alias", fixed(0, 0), Syntax, "-- <new> <old>",
        "Define a new name for an existing word's body.";
    Bird => "bird", fixed(0, 0), Syntax, "-- <name> <term>",
        "Define a word as a combinator term.";
    Combinators => "combinators", fixed(0, 0), Syntax, "--",
        "Read the rest of the input as combinator terms.";
    Bye => "bye", fixed(0, 0), Syntax, "--",
        "End the session.";
}

lazy_static! {
    /// Primitives by their dictionary name, for reading dumps.
    static ref PRIMITIVES_BY_NAME: HashMap<&'static str, Primitive> = Primitive::ALL
        .iter()
        .map(|primitive| (primitive.name(), *primitive))
        .collect();
}

impl Primitive {
    pub fn from_name(name: &str) -> Option<Primitive> {
        PRIMITIVES_BY_NAME.get(name).copied()
    }

    pub fn is_syntax(self) -> bool {
        self.kind() == PrimitiveKind::Syntax
    }
}
