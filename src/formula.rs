use crate::dimacs::{self, Dimacs};
use crate::parse::{self, ParseError};
use std::error::Error;
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

#[derive(Debug)]
pub enum FormulaError {
    /// The clause at the given position of the added sequence contains `0`
    ZeroLiteral { clause: usize },
    /// The literal has no negation in `i32`, i.e., it is `i32::MIN`
    LiteralOutOfRange { clause: usize, literal: i32 },
    Parse(ParseError),
    Io(std::io::Error),
}

impl fmt::Display for FormulaError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FormulaError::ZeroLiteral { clause } => {
                write!(f, "clause {} contains the literal 0", clause)
            }
            FormulaError::LiteralOutOfRange { clause, literal } => write!(
                f,
                "clause {} contains the literal {}, literals are bounded by {} in absolute value",
                clause,
                literal,
                i32::MAX
            ),
            FormulaError::Parse(err) => write!(f, "{}", err),
            FormulaError::Io(err) => write!(f, "could not read formula: {}", err),
        }
    }
}

impl Error for FormulaError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            FormulaError::ZeroLiteral { .. } | FormulaError::LiteralOutOfRange { .. } => None,
            FormulaError::Parse(err) => Some(err),
            FormulaError::Io(err) => Some(err),
        }
    }
}

impl From<ParseError> for FormulaError {
    fn from(err: ParseError) -> Self {
        FormulaError::Parse(err)
    }
}

impl From<std::io::Error> for FormulaError {
    fn from(err: std::io::Error) -> Self {
        FormulaError::Io(err)
    }
}

/// An append-only CNF formula.
///
/// The variable count is the largest variable index seen in any added clause,
/// it never decreases.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Formula {
    clauses: Vec<Vec<i32>>,
    num_variables: u32,
}

impl Formula {
    pub fn new() -> Formula {
        Formula::default()
    }

    pub fn from_dimacs_file<P: AsRef<Path>>(path: P) -> Result<Formula, FormulaError> {
        let mut file = File::open(path)?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;
        Ok(contents.parse()?)
    }

    /// Appends a clause, a clause containing `0` or `i32::MIN` is rejected and leaves the formula unchanged.
    pub fn add_clause(&mut self, clause: &[i32]) -> Result<(), FormulaError> {
        if clause.contains(&0) {
            return Err(FormulaError::ZeroLiteral { clause: 0 });
        }
        if clause.contains(&i32::MIN) {
            return Err(FormulaError::LiteralOutOfRange {
                clause: 0,
                literal: i32::MIN,
            });
        }
        self.num_variables = clause
            .iter()
            .map(|literal| literal.unsigned_abs())
            .fold(self.num_variables, u32::max);
        self.clauses.push(clause.to_vec());
        Ok(())
    }

    /// Appends clauses in order, stops at the first rejected clause.
    ///
    /// Clauses before the rejected one stay in the formula.
    pub fn append_formula<I, C>(&mut self, clauses: I) -> Result<(), FormulaError>
    where
        I: IntoIterator<Item = C>,
        C: AsRef<[i32]>,
    {
        for (index, clause) in clauses.into_iter().enumerate() {
            self.add_clause(clause.as_ref()).map_err(|err| match err {
                FormulaError::ZeroLiteral { .. } => FormulaError::ZeroLiteral { clause: index },
                FormulaError::LiteralOutOfRange { literal, .. } => {
                    FormulaError::LiteralOutOfRange {
                        clause: index,
                        literal,
                    }
                }
                err => err,
            })?;
        }
        Ok(())
    }

    pub fn num_variables(&self) -> u32 {
        self.num_variables
    }

    pub fn num_clauses(&self) -> usize {
        self.clauses.len()
    }

    pub fn clauses(&self) -> &[Vec<i32>] {
        &self.clauses
    }

    /// Read-only copy of the current state, unaffected by later additions.
    pub fn snapshot(&self) -> Arc<Formula> {
        Arc::new(self.clone())
    }
}

impl FromStr for Formula {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse::dimacs::parse(s)
    }
}

impl Dimacs for Formula {
    fn dimacs(&self) -> String {
        dimacs::encode(&self.clauses, self.num_variables)
    }
}

#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn test_counts() {
        let mut formula = Formula::new();
        assert_eq!(formula.num_variables(), 0);
        assert_eq!(formula.num_clauses(), 0);
        formula.add_clause(&[1, -5]).unwrap();
        formula.add_clause(&[-2]).unwrap();
        assert_eq!(formula.num_variables(), 5);
        assert_eq!(formula.num_clauses(), 2);
        // repeated reads are stable
        assert_eq!(formula.num_variables(), 5);
        assert_eq!(formula.num_clauses(), 2);
    }

    #[test]
    fn test_num_variables_monotone() {
        let mut formula = Formula::new();
        let mut last = 0;
        for clause in &[vec![3], vec![1, 2], vec![-7], vec![], vec![4, -4]] {
            formula.add_clause(clause).unwrap();
            assert!(formula.num_variables() >= last);
            last = formula.num_variables();
        }
        assert_eq!(last, 7);
    }

    #[test]
    fn test_zero_literal() {
        let mut formula = Formula::new();
        formula.add_clause(&[1]).unwrap();
        assert!(formula.add_clause(&[2, 0]).is_err());
        assert_eq!(formula.num_clauses(), 1);
        assert_eq!(formula.num_variables(), 1);

        match formula.append_formula(vec![vec![3], vec![0]]) {
            Err(FormulaError::ZeroLiteral { clause }) => assert_eq!(clause, 1),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(formula.num_clauses(), 2);
    }

    #[test]
    fn test_append_formula_tracks_variables() {
        let mut formula = Formula::new();
        formula
            .append_formula(&[vec![1, 2], vec![-9, 3]])
            .unwrap();
        assert_eq!(formula.num_variables(), 9);
        assert_eq!(formula.num_clauses(), 2);
    }

    #[test]
    fn test_snapshot_is_isolated() {
        let mut formula = Formula::new();
        formula.add_clause(&[1, 2]).unwrap();
        let snapshot = formula.snapshot();
        formula.add_clause(&[-3]).unwrap();
        assert_eq!(snapshot.num_clauses(), 1);
        assert_eq!(snapshot.num_variables(), 2);
        assert_eq!(formula.num_clauses(), 2);
    }

    #[test]
    fn test_dimacs() {
        let formula: Formula = "p cnf 3 2\n1 -2 0\n3 0\n".parse().unwrap();
        assert_eq!(formula.dimacs(), "p cnf 3 2\n1 -2 0\n3 0\n");
    }

    #[test]
    fn test_extreme_literal() {
        let mut formula = Formula::new();
        formula.add_clause(&[i32::min_value() + 1]).unwrap();
        assert_eq!(formula.num_variables(), i32::max_value() as u32);
    }

    #[test]
    fn test_min_literal_rejected() {
        let mut formula = Formula::new();
        formula.add_clause(&[2]).unwrap();
        match formula.add_clause(&[1, i32::min_value()]) {
            Err(FormulaError::LiteralOutOfRange { literal, .. }) => {
                assert_eq!(literal, i32::min_value())
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(formula.num_clauses(), 1);
        assert_eq!(formula.num_variables(), 2);

        match formula.append_formula(vec![vec![3], vec![-1, i32::min_value()]]) {
            Err(FormulaError::LiteralOutOfRange { clause, .. }) => assert_eq!(clause, 1),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(formula.num_clauses(), 2);
        assert_eq!(formula.num_variables(), 3);
    }
}
