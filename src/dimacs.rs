use crate::solve::{SolveOutcome, WorkerError};
use log::{debug, warn};
use std::error::Error;
use std::fmt;
use std::io::{self, Write};

/// This trait describes objects that can be repesented as
/// (a possible extension) of the DIMACS file format.
pub trait Dimacs {
    fn dimacs(&self) -> String;
}

/// Renders clauses as DIMACS CNF, `num_variables` is written to the header as given.
pub fn encode<C: AsRef<[i32]>>(clauses: &[C], num_variables: u32) -> String {
    encode_with_assumptions(clauses, num_variables, &[])
}

/// Like `encode`, but forces every assumption by an additional unit clause.
///
/// The header counts include the unit clauses and the variable count is
/// raised to cover the assumed variables.
pub fn encode_with_assumptions<C: AsRef<[i32]>>(
    clauses: &[C],
    num_variables: u32,
    assumptions: &[i32],
) -> String {
    let num_variables = assumptions
        .iter()
        .map(|l| l.unsigned_abs())
        .fold(num_variables, u32::max);
    let mut dimacs = String::new();
    dimacs.push_str(&format!(
        "p cnf {} {}\n",
        num_variables,
        clauses.len() + assumptions.len()
    ));
    for clause in clauses {
        for literal in clause.as_ref() {
            dimacs.push_str(&format!("{} ", literal));
        }
        dimacs.push_str("0\n");
    }
    for assumption in assumptions {
        dimacs.push_str(&format!("{} 0\n", assumption));
    }
    dimacs
}

pub fn write_cnf<W: Write, C: AsRef<[i32]>>(
    writer: &mut W,
    clauses: &[C],
    num_variables: u32,
    assumptions: &[i32],
) -> io::Result<()> {
    writer.write_all(encode_with_assumptions(clauses, num_variables, assumptions).as_bytes())?;
    writer.flush()
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub enum DecodeError {
    /// No `s ...` line in the output
    MissingClassification,
    UnknownClassification(String),
    MalformedAssignment(String),
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DecodeError::MissingClassification => {
                write!(f, "solver output contains no `s` classification line")
            }
            DecodeError::UnknownClassification(line) => {
                write!(f, "unknown classification line `{}`", line)
            }
            DecodeError::MalformedAssignment(line) => {
                write!(f, "malformed assignment line `{}`", line)
            }
        }
    }
}

impl Error for DecodeError {}

impl From<DecodeError> for WorkerError {
    fn from(err: DecodeError) -> Self {
        WorkerError::MalformedOutput(err.to_string())
    }
}

enum Classification {
    Satisfiable,
    Unsatisfiable,
    Unknown,
}

/// Interprets the output lines of a SAT solver.
///
/// The first `s` line classifies the result, all `v` lines are concatenated in
/// order of appearance with their `0` terminators removed. Other lines are ignored.
pub fn decode<I, S>(lines: I) -> Result<SolveOutcome, DecodeError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut classification = None;
    let mut assignment = Vec::new();
    let mut value_lines = 0;

    for line in lines {
        let line = line.as_ref().trim();
        let mut tokens = line.split_whitespace();
        match tokens.next() {
            Some("s") => {
                if classification.is_some() {
                    debug!("ignoring additional classification line `{}`", line);
                    continue;
                }
                let rest: Vec<&str> = tokens.collect();
                classification = Some(match rest.as_slice() {
                    ["SATISFIABLE"] => Classification::Satisfiable,
                    ["UNSATISFIABLE"] => Classification::Unsatisfiable,
                    ["UNKNOWN"] | ["INDETERMINATE"] => Classification::Unknown,
                    _ => return Err(DecodeError::UnknownClassification(line.to_string())),
                });
            }
            Some("v") => {
                value_lines += 1;
                if value_lines > 1 {
                    covered_by!("decode.concatenates_value_lines");
                }
                let values = tokens
                    .map(|token| token.parse::<i32>())
                    .collect::<Result<Vec<i32>, _>>()
                    .map_err(|_| DecodeError::MalformedAssignment(line.to_string()))?;
                match values.iter().position(|&v| v == 0) {
                    None => assignment.extend(values),
                    Some(end) if end + 1 == values.len() => {
                        assignment.extend_from_slice(&values[..end])
                    }
                    Some(_) => return Err(DecodeError::MalformedAssignment(line.to_string())),
                }
            }
            _ => continue,
        }
    }

    match classification {
        None => {
            warn!("solver output without classification line");
            Err(DecodeError::MissingClassification)
        }
        Some(Classification::Satisfiable) => Ok(SolveOutcome::Satisfiable(assignment)),
        Some(Classification::Unsatisfiable) => Ok(SolveOutcome::Unsatisfiable),
        Some(Classification::Unknown) => Ok(SolveOutcome::Failed(WorkerError::Indeterminate)),
    }
}
