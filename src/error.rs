use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyntaxError {
    #[error("unmatched ')'")]
    UnmatchedCloseParen,
    #[error("unmatched '('")]
    UnmatchedOpenParen,
    #[error("operator '{0}' is missing an operand")]
    MissingOperand(char),
    #[error("character {0:?} is reserved")]
    ReservedCharacter(char),
    #[error("empty pattern")]
    EmptyPattern,
    #[error("{0} subexpressions left unconnected")]
    DanglingOperands(usize),
}

// Reported with the offending pattern so a bad line in a pattern file can be
// pointed at directly. `index` is 1-based, matching the pattern numbering in
// the token output.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("pattern {index} ({pattern:?}): {source}")]
pub struct PatternError {
    pub pattern: String,
    pub index: usize,
    pub source: SyntaxError,
}
