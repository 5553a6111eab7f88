use super::{BackendError, Interrupt, Solver};
use crate::literal::{Literal, Variable};
use bit_vec::BitVec;
use log::{debug, trace};
use rustc_hash::FxHashMap;
use std::sync::atomic::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Branching {
    /// Lowest unassigned variable
    FirstUnassigned,
    /// Literal with the most occurrences in clauses that are not yet satisfied
    MostOccurrences,
}

#[derive(Debug, Clone, Copy)]
pub struct DpllOptions {
    pub branching: Branching,
    /// Polarity tried first for `FirstUnassigned` decisions
    pub positive_first: bool,
}

impl Default for DpllOptions {
    fn default() -> DpllOptions {
        DpllOptions {
            branching: Branching::FirstUnassigned,
            positive_first: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Reason {
    /// Assumption of the current call, never undone by backtracking
    Fixed,
    Decision,
    /// Second branch of an exhausted decision
    Flipped,
    Implied,
}

/// A plain DPLL search with unit propagation and chronological backtracking.
pub struct DpllSolver {
    options: DpllOptions,
    clauses: Vec<Vec<Literal>>,
    num_variables: Variable,

    /// indexed by variable
    assigned: BitVec,
    polarity: BitVec,

    trail: Vec<(Literal, Reason)>,
    model: Vec<i32>,
    has_empty_clause: bool,
    interrupt: Option<Interrupt>,
    decisions: usize,
}

impl DpllSolver {
    pub fn new(options: DpllOptions) -> DpllSolver {
        DpllSolver {
            options,
            clauses: Vec::new(),
            num_variables: 0,
            assigned: BitVec::from_elem(1, false),
            polarity: BitVec::from_elem(1, false),
            trail: Vec::new(),
            model: Vec::new(),
            has_empty_clause: false,
            interrupt: None,
            decisions: 0,
        }
    }

    pub fn decisions(&self) -> usize {
        self.decisions
    }

    fn ensure_variable(&mut self, variable: Variable) {
        if variable > self.num_variables {
            let additional = (variable - self.num_variables) as usize;
            self.assigned.grow(additional, false);
            self.polarity.grow(additional, false);
            self.num_variables = variable;
        }
    }

    fn value(&self, literal: Literal) -> Option<bool> {
        let variable = literal.variable() as usize;
        if self.assigned[variable] {
            Some(self.polarity[variable] != literal.signed())
        } else {
            None
        }
    }

    fn assign(&mut self, literal: Literal, reason: Reason) {
        let variable = literal.variable() as usize;
        debug_assert!(!self.assigned[variable]);
        self.assigned.set(variable, true);
        self.polarity.set(variable, !literal.signed());
        self.trail.push((literal, reason));
    }

    fn unassign(&mut self, literal: Literal) {
        self.assigned.set(literal.variable() as usize, false);
    }

    fn reset(&mut self) {
        self.assigned.clear();
        self.trail.clear();
        self.model.clear();
    }

    fn interrupted(&self) -> bool {
        self.interrupt
            .as_ref()
            .map_or(false, |flag| flag.load(Ordering::Relaxed))
    }

    /// Assigns unit literals until fixpoint, returns `false` on a falsified clause.
    fn propagate(&mut self) -> bool {
        loop {
            let mut unit = None;
            for clause in self.clauses.iter() {
                let mut open = None;
                let mut num_open = 0;
                let mut satisfied = false;
                for &literal in clause.iter() {
                    match self.value(literal) {
                        Some(true) => {
                            satisfied = true;
                            break;
                        }
                        Some(false) => {}
                        None => {
                            num_open += 1;
                            open = Some(literal);
                        }
                    }
                }
                if satisfied {
                    continue;
                }
                match num_open {
                    0 => return false,
                    1 => {
                        unit = open;
                        break;
                    }
                    _ => {}
                }
            }
            match unit {
                None => return true,
                Some(literal) => {
                    trace!("propagate {}", literal);
                    self.assign(literal, Reason::Implied);
                }
            }
        }
    }

    /// Undoes assignments up to the most recent open decision and returns its negation.
    fn backtrack(&mut self) -> Option<Literal> {
        while let Some(&(literal, reason)) = self.trail.last() {
            match reason {
                Reason::Fixed => return None,
                Reason::Decision => {
                    self.trail.pop();
                    self.unassign(literal);
                    return Some(-literal);
                }
                Reason::Flipped | Reason::Implied => {
                    self.trail.pop();
                    self.unassign(literal);
                }
            }
        }
        None
    }

    fn pick_branch(&self) -> Option<Literal> {
        if self.options.branching == Branching::MostOccurrences {
            let mut scores: FxHashMap<Literal, usize> = FxHashMap::default();
            for clause in self.clauses.iter() {
                if clause.iter().any(|&l| self.value(l) == Some(true)) {
                    continue;
                }
                for &literal in clause.iter().filter(|&&l| self.value(l).is_none()) {
                    *scores.entry(literal).or_insert(0) += 1;
                }
            }
            let best = scores
                .into_iter()
                .max_by(|(l1, s1), (l2, s2)| s1.cmp(s2).then(l2.cmp(l1)))
                .map(|(literal, _)| literal);
            if best.is_some() {
                return best;
            }
            // remaining variables do not occur in open clauses
        }
        (1..=self.num_variables)
            .find(|&v| !self.assigned[v as usize])
            .map(|v| Literal::new(v, !self.options.positive_first))
    }

    fn extract_model(&mut self) {
        self.model = (1..=self.num_variables)
            .map(|v| {
                debug_assert!(self.assigned[v as usize]);
                if self.polarity[v as usize] {
                    v as i32
                } else {
                    -(v as i32)
                }
            })
            .collect();
    }
}

impl Solver for DpllSolver {
    fn add_clause(&mut self, clause: &[i32]) -> Result<(), BackendError> {
        if clause.contains(&0) {
            return Err(BackendError::Failure(format!(
                "clause {:?} contains the literal 0",
                clause
            )));
        }
        if clause.contains(&i32::MIN) {
            return Err(BackendError::Failure(format!(
                "clause {:?} contains a literal without negation",
                clause
            )));
        }
        let mut literals: Vec<Literal> = clause.iter().map(|&l| Literal::from(l)).collect();
        literals.sort();
        literals.dedup();
        if let Some(max) = literals.iter().map(|l| l.variable()).max() {
            self.ensure_variable(max);
        } else {
            self.has_empty_clause = true;
        }
        self.clauses.push(literals);
        Ok(())
    }

    fn solve(&mut self, assumptions: &[i32]) -> Result<bool, BackendError> {
        self.reset();
        if assumptions.contains(&0) {
            return Err(BackendError::Failure(
                "assumptions contain the literal 0".to_string(),
            ));
        }
        if assumptions.contains(&i32::MIN) {
            return Err(BackendError::Failure(
                "assumptions contain a literal without negation".to_string(),
            ));
        }
        for &assumption in assumptions {
            self.ensure_variable(assumption.unsigned_abs());
        }
        if self.has_empty_clause {
            return Ok(false);
        }
        for &assumption in assumptions {
            let literal = Literal::from(assumption);
            match self.value(literal) {
                Some(true) => continue,
                Some(false) => return Ok(false),
                None => self.assign(literal, Reason::Fixed),
            }
        }
        if !self.propagate() {
            return Ok(false);
        }

        loop {
            if self.interrupted() {
                debug!("dpll interrupted after {} decisions", self.decisions);
                return Err(BackendError::Interrupted);
            }
            let literal = match self.pick_branch() {
                None => {
                    self.extract_model();
                    return Ok(true);
                }
                Some(literal) => literal,
            };
            trace!("decide {}", literal);
            self.decisions += 1;
            self.assign(literal, Reason::Decision);
            while !self.propagate() {
                match self.backtrack() {
                    None => return Ok(false),
                    Some(flipped) => self.assign(flipped, Reason::Flipped),
                }
            }
        }
    }

    fn model(&self) -> Vec<i32> {
        self.model.clone()
    }

    fn num_variables(&self) -> u32 {
        self.num_variables
    }

    fn set_interrupt(&mut self, interrupt: Interrupt) {
        self.interrupt = Some(interrupt);
    }
}
