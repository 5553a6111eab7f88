use super::{BackendError, Solver};
use ::cryptominisat::{Lbool, Lit};
use log::trace;

/// In-process CryptoMiniSat engine.
///
/// The bindings expose no interrupt, a cancelled instance runs to completion
/// on a detached thread.
pub struct CryptoMiniSat {
    sat: ::cryptominisat::Solver,
    /// `variables[v - 1]` is the positive SAT literal of DIMACS variable `v`
    variables: Vec<Lit>,
    model: Vec<i32>,
}

impl CryptoMiniSat {
    pub fn new() -> CryptoMiniSat {
        CryptoMiniSat {
            sat: ::cryptominisat::Solver::new(),
            variables: Vec::new(),
            model: Vec::new(),
        }
    }

    fn lit_to_sat_lit(&mut self, literal: i32) -> Result<Lit, BackendError> {
        if literal == 0 {
            return Err(BackendError::Failure(
                "the literal 0 is not a valid literal".to_string(),
            ));
        }
        let variable = literal.unsigned_abs() as usize;
        while self.variables.len() < variable {
            let lit = self.sat.new_var();
            self.variables.push(lit);
        }
        let lit = self.variables[variable - 1];
        Ok(if literal < 0 { !lit } else { lit })
    }
}

impl Default for CryptoMiniSat {
    fn default() -> Self {
        Self::new()
    }
}

impl Solver for CryptoMiniSat {
    fn add_clause(&mut self, clause: &[i32]) -> Result<(), BackendError> {
        let mut sat_clause = Vec::with_capacity(clause.len());
        for &literal in clause {
            sat_clause.push(self.lit_to_sat_lit(literal)?);
        }
        self.sat.add_clause(sat_clause.as_ref());
        Ok(())
    }

    fn solve(&mut self, assumptions: &[i32]) -> Result<bool, BackendError> {
        self.model.clear();
        let mut sat_assumptions = Vec::with_capacity(assumptions.len());
        for &literal in assumptions {
            sat_assumptions.push(self.lit_to_sat_lit(literal)?);
        }
        match self.sat.solve_with_assumptions(sat_assumptions.as_ref()) {
            Lbool::True => {
                let model = self.sat.get_model();
                self.model = self
                    .variables
                    .iter()
                    .enumerate()
                    .map(|(index, lit)| {
                        let variable = index as i32 + 1;
                        match model[lit.var() as usize] {
                            Lbool::False => -variable,
                            _ => variable,
                        }
                    })
                    .collect();
                trace!("cryptominisat model with {} variables", self.model.len());
                Ok(true)
            }
            Lbool::False => Ok(false),
            Lbool::Undef => Err(BackendError::Undetermined),
        }
    }

    fn model(&self) -> Vec<i32> {
        self.model.clone()
    }

    fn num_variables(&self) -> u32 {
        self.variables.len() as u32
    }
}
