use std::ops;

pub type Variable = u32;

/// A literal packed into a single word, the lowest bit stores the sign.
#[derive(PartialEq, Eq, PartialOrd, Ord, Copy, Clone, Debug, Hash)]
pub struct Literal {
    x: u32,
}

impl Literal {
    pub fn new(variable: Variable, signed: bool) -> Literal {
        Literal {
            x: variable << 1 | (signed as u32),
        }
    }

    /// Returns true if `Literal` is signed
    ///
    /// # Examples
    ///
    /// ```
    /// assert!(satfolio::Literal::new(1, true).signed());
    /// assert!(!satfolio::Literal::new(1, false).signed());
    /// ```
    pub fn signed(self) -> bool {
        (self.x & 1) != 0
    }

    pub fn unsigned(self) -> Literal {
        Literal { x: self.x & !1 }
    }

    pub fn variable(self) -> Variable {
        self.x >> 1
    }

    pub fn dimacs(self) -> i32 {
        let base = self.variable() as i32;
        if self.signed() {
            -base
        } else {
            base
        }
    }
}

impl ops::Neg for Literal {
    type Output = Literal;

    fn neg(self) -> Literal {
        Literal { x: self.x ^ 1 }
    }
}

impl From<i32> for Literal {
    fn from(literal: i32) -> Self {
        let signed = literal < 0;
        let abs = literal.unsigned_abs() as Variable;
        Literal::new(abs, signed)
    }
}

impl std::fmt::Display for Literal {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.dimacs())
    }
}
