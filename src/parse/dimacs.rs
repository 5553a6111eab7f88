use super::{CharIterator, ParseError, SourcePos};
use crate::formula::Formula;
use crate::literal::Literal;

#[derive(Debug, Eq, PartialEq)]
pub enum DimacsToken {
    /// p cnf header
    Header,

    /// A Literal, i.e., a signed or unsigned integer
    Lit(Literal),

    /// A zero integer, used as an ending sign
    Zero,

    /// End-of-line
    EOL,

    /// End-of-file, or the `%` end marker of SATLIB instances
    EOF,
}

pub struct DimacsTokenStream<'a> {
    chars: CharIterator<'a>,
}

impl<'a> DimacsTokenStream<'a> {
    pub fn new(content: &'a str) -> DimacsTokenStream<'a> {
        DimacsTokenStream {
            chars: CharIterator::new(content),
        }
    }

    pub fn next_token(&mut self) -> Result<DimacsToken, ParseError> {
        while let Some(c) = self.chars.next() {
            match c {
                'c' => {
                    // comment line, ignore until next newline
                    self.chars.skip_while(|c| *c != '\n');
                }
                'p' => {
                    // DIMACS header
                    self.chars.expect_str(" cnf ")?;
                    return Ok(DimacsToken::Header);
                }
                '%' => return Ok(DimacsToken::EOF),
                '-' => {
                    // negated literal
                    return Ok(DimacsToken::Lit(self.chars.read_literal('-')?));
                }
                c if c.is_ascii_digit() => {
                    let literal = self.chars.read_literal(c)?;
                    if literal.variable() == 0 {
                        return Ok(DimacsToken::Zero);
                    }
                    return Ok(DimacsToken::Lit(literal));
                }
                '\n' => return Ok(DimacsToken::EOL),
                c if c.is_ascii_whitespace() => continue,
                _ => {
                    return Err(ParseError {
                        msg: format!("Encountered unknown token `{}` during lexing", c),
                        pos: self.chars.pos,
                    });
                }
            }
        }
        // end of file
        Ok(DimacsToken::EOF)
    }

    pub fn pos(&self) -> SourcePos {
        self.chars.pos
    }

    fn error<T>(&self, msg: String) -> Result<T, ParseError> {
        Err(ParseError {
            msg,
            pos: self.pos(),
        })
    }
}

/// Parses a DIMACS CNF instance into a formula
pub fn parse(content: &str) -> Result<Formula, ParseError> {
    let mut lexer = DimacsTokenStream::new(content);
    let (num_variables, num_clauses) = parse_header(&mut lexer)?;
    let mut formula = Formula::new();
    parse_clauses(&mut lexer, &mut formula, num_variables, num_clauses)?;
    Ok(formula)
}

/// Parses the `p cnf NUM NUM` header and returns number of variables and number of clauses
pub fn parse_header(lexer: &mut DimacsTokenStream) -> Result<(u32, usize), ParseError> {
    // first non-EOL token has to be `p cnf ` header
    loop {
        match lexer.next_token()? {
            DimacsToken::EOL => continue,
            DimacsToken::Header => break,
            token => {
                return lexer.error(format!("Expect `p cnf`, but found `{:?}`", token));
            }
        }
    }
    let num_variables = header_number(lexer, "variables")?;
    let num_clauses = header_number(lexer, "clauses")?;
    Ok((num_variables, num_clauses as usize))
}

fn header_number(lexer: &mut DimacsTokenStream, what: &str) -> Result<u32, ParseError> {
    match lexer.next_token()? {
        DimacsToken::Zero => Ok(0),
        DimacsToken::Lit(l) if l.signed() => lexer.error(format!(
            "Malformed `p cnf` header, found negative value for number of {}",
            what
        )),
        DimacsToken::Lit(l) => Ok(l.variable()),
        token => lexer.error(format!(
            "Malformed `p cnf` header, expected number of {}, found `{:?}`",
            what, token
        )),
    }
}

/// Reads `0`-terminated clauses until the end of input, clauses may span several lines.
pub fn parse_clauses(
    lexer: &mut DimacsTokenStream,
    formula: &mut Formula,
    num_variables: u32,
    num_clauses_expected: usize,
) -> Result<(), ParseError> {
    let mut literals: Vec<i32> = Vec::new();
    let mut num_clauses_read = 0;

    loop {
        match lexer.next_token()? {
            DimacsToken::Zero => {
                // end of clause, the lexer only produces literals the formula accepts
                if let Err(err) = formula.add_clause(&literals) {
                    return lexer.error(format!("Rejected clause: {}", err));
                }
                literals.clear();
                num_clauses_read += 1;
            }
            DimacsToken::Lit(l) => {
                if l.variable() > num_variables {
                    return lexer.error(format!(
                        "Variable {} exceeds the {} variables declared in the header",
                        l.variable(),
                        num_variables
                    ));
                }
                literals.push(l.dimacs());
            }
            DimacsToken::EOL => continue,
            DimacsToken::EOF => {
                if !literals.is_empty() {
                    return lexer.error("Unexpected end of input while reading clause".to_string());
                }
                if num_clauses_expected != num_clauses_read {
                    return lexer.error(format!(
                        "Expected {} clauses, but found {}",
                        num_clauses_expected, num_clauses_read
                    ));
                }
                return Ok(());
            }
            DimacsToken::Header => {
                return lexer.error("Unexpected second `p cnf` header".to_string());
            }
        }
    }
}
