//! Call-argument alignment.
//!
//! Aligns a sequence of positional and named arguments against an ordered
//! parameter list, producing a slot mapping and a list of issues. The
//! function is pure: it never evaluates anything and never aborts. The
//! type checker reports every issue; the interpreter raises on the first.

use std::fmt;

use crate::expr::Arg;

/// A problem found while aligning arguments to parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlignIssue {
    TooManyArguments { expected: usize, found: usize },
    UnknownParameter { name: String },
    DuplicateParameter { name: String },
    MissingParameter { name: String },
    PositionalAfterNamed,
}

impl fmt::Display for AlignIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlignIssue::TooManyArguments { expected, found } => {
                write!(f, "too many arguments: expected {}, found {}", expected, found)
            }
            AlignIssue::UnknownParameter { name } => {
                write!(f, "unknown parameter `{}`", name)
            }
            AlignIssue::DuplicateParameter { name } => {
                write!(f, "parameter `{}` supplied more than once", name)
            }
            AlignIssue::MissingParameter { name } => {
                write!(f, "missing argument for parameter `{}`", name)
            }
            AlignIssue::PositionalAfterNamed => {
                write!(f, "positional argument after named argument")
            }
        }
    }
}

/// The result of aligning arguments against a parameter list.
///
/// `slots[i]` is the index into the argument sequence that fills parameter
/// `i`, or `None` when no argument does.
#[derive(Debug, Clone)]
pub struct Alignment {
    pub slots: Vec<Option<usize>>,
    pub issues: Vec<AlignIssue>,
}

impl Alignment {
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Align `args` against the ordered parameter names `params`.
///
/// - Positional arguments consume slots in declaration order.
/// - The first named argument locks named mode; later positionals are
///   reported and skipped.
/// - An unknown name does not consume a slot.
/// - A duplicate of an already-filled slot is reported and dropped.
/// - Unfilled slots are reported as missing.
pub fn align_args(params: &[&str], args: &[Arg]) -> Alignment {
    let mut slots: Vec<Option<usize>> = vec![None; params.len()];
    let mut issues = Vec::new();
    let mut named_mode = false;
    let mut next_positional = 0usize;
    let mut overflow_reported = false;

    for (arg_idx, arg) in args.iter().enumerate() {
        match &arg.name {
            Some(name) => {
                named_mode = true;
                match params.iter().position(|p| p == name) {
                    None => issues.push(AlignIssue::UnknownParameter { name: name.clone() }),
                    Some(slot) => {
                        if slots[slot].is_some() {
                            issues.push(AlignIssue::DuplicateParameter { name: name.clone() });
                        } else {
                            slots[slot] = Some(arg_idx);
                        }
                    }
                }
            }
            None => {
                if named_mode {
                    issues.push(AlignIssue::PositionalAfterNamed);
                    continue;
                }
                if next_positional >= params.len() {
                    if !overflow_reported {
                        issues.push(AlignIssue::TooManyArguments {
                            expected: params.len(),
                            found: args.len(),
                        });
                        overflow_reported = true;
                    }
                    continue;
                }
                slots[next_positional] = Some(arg_idx);
                next_positional += 1;
            }
        }
    }

    for (slot, filled) in slots.iter().enumerate() {
        if filled.is_none() {
            issues.push(AlignIssue::MissingParameter {
                name: params[slot].to_string(),
            });
        }
    }

    Alignment { slots, issues }
}
