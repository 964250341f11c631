//! Classification of a token sequence into the shape the launcher executes.
//!
//! At most one operator is honored per line. `|` and `>` are each searched for
//! independently; when both are present the leftmost one splits the line and
//! everything from it onward is excluded from the left-hand command.

use crate::error::ShellError;

const PIPE: &str = "|";
const REDIRECT: &str = ">";

/// Which operator governs a split.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Pipe,
    Redirect,
}

impl Operator {
    fn token(self) -> &'static str {
        match self {
            Operator::Pipe => PIPE,
            Operator::Redirect => REDIRECT,
        }
    }

    fn usage(self) -> &'static str {
        match self {
            Operator::Pipe => "command_1 | command_2",
            Operator::Redirect => "command > [file or directory]",
        }
    }
}

/// Index of the governing operator token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitPoint {
    pub index: usize,
    pub operator: Operator,
}

/// A classified command, borrowing its words from the token sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command<'a> {
    /// `cmd arg...`: a built-in or a single external program.
    Plain(&'a [String]),
    /// `cmd arg... > target`. Words after the target are carried in `ignored`.
    Redirect {
        argv: &'a [String],
        target: &'a str,
        ignored: &'a [String],
    },
    /// `left... | right...`
    Pipe {
        left: &'a [String],
        right: &'a [String],
    },
}

/// The outcome of classifying one line.
///
/// `diagnostics` holds a syntax error for every malformed operator, including one
/// that lost to the other operator. `command` is `None` when the line must not run.
#[derive(Debug)]
pub struct Classification<'a> {
    pub command: Option<Command<'a>>,
    pub diagnostics: Vec<ShellError>,
}

/// Scan for one operator. `Err` means the operator is present but misplaced.
fn scan(args: &[String], operator: Operator) -> Result<Option<usize>, ShellError> {
    let token = operator.token();
    let malformed = || ShellError::Syntax {
        expected: operator.usage(),
    };

    if args.first().is_some_and(|a| a == token) || (args.len() == 2 && args[1] == token) {
        return Err(malformed());
    }
    if args.len() < 3 {
        return Ok(None);
    }
    match args.iter().skip(1).position(|a| a == token) {
        Some(pos) if pos + 1 == args.len() - 1 => Err(malformed()),
        Some(pos) => Ok(Some(pos + 1)),
        None => Ok(None),
    }
}

/// Find the single governing split point, collecting a syntax error for every
/// malformed operator along the way.
pub fn find_split_point(args: &[String]) -> (Option<SplitPoint>, Vec<ShellError>) {
    let mut diagnostics = Vec::new();
    let mut best: Option<SplitPoint> = None;

    for operator in [Operator::Pipe, Operator::Redirect] {
        match scan(args, operator) {
            Ok(Some(index)) => {
                if best.is_none_or(|b| index < b.index) {
                    best = Some(SplitPoint { index, operator });
                }
            }
            Ok(None) => {}
            Err(err) => diagnostics.push(err),
        }
    }
    (best, diagnostics)
}

/// Classify a token sequence.
///
/// A line with a malformed operator and no valid split is aborted; a valid split
/// still runs even when the other operator was malformed.
pub fn classify(args: &[String]) -> Classification<'_> {
    let (split, diagnostics) = find_split_point(args);
    let command = match split {
        Some(SplitPoint {
            index,
            operator: Operator::Pipe,
        }) => Some(Command::Pipe {
            left: &args[..index],
            right: &args[index + 1..],
        }),
        Some(SplitPoint {
            index,
            operator: Operator::Redirect,
        }) => Some(Command::Redirect {
            argv: &args[..index],
            target: &args[index + 1],
            ignored: &args[index + 2..],
        }),
        None if diagnostics.is_empty() && !args.is_empty() => Some(Command::Plain(args)),
        None => None,
    };
    Classification {
        command,
        diagnostics,
    }
}
