use std::collections::HashSet;
use std::fmt;

use itertools::Itertools;

use crate::automaton::{compile, Nfa, State};
use crate::error::PatternError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub lexeme: String,
    // 0-based index of the winning pattern; None when no pattern matched and
    // the character was echoed verbatim.
    pub pattern: Option<usize>,
}

impl Token {
    // 1-based pattern number as used in the rendered output, 0 for no match.
    pub fn pattern_number(&self) -> usize {
        self.pattern.map_or(0, |index| index + 1)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{},{}>", self.lexeme, self.pattern_number())
    }
}

// Longest k >= 1 such that the automaton accepts text[..k]. A single forward
// pass extends the active set one symbol at a time and remembers the last
// accepting position, so gaps in the accepted lengths don't matter.
pub fn longest_prefix(nfa: &Nfa, text: &[char]) -> Option<usize> {
    let mut active: HashSet<State> = HashSet::from([0]);
    let mut best = None;
    for (i, &symbol) in text.iter().enumerate() {
        active = nfa.step(&active, symbol);
        if active.is_empty() {
            break;
        }
        if active.iter().any(|state| nfa.final_states.contains(state)) {
            best = Some(i + 1);
        }
    }
    best
}

pub fn tokenize(input: &str, patterns: &[Nfa]) -> Vec<Token> {
    let chars = input.chars().collect_vec();
    let mut tokens = vec![];
    let mut index = 0;
    while index < chars.len() {
        // (pattern, length); strictly-greater keeps the earliest pattern on ties.
        let mut best: Option<(usize, usize)> = None;
        for (i, nfa) in patterns.iter().enumerate() {
            if let Some(len) = longest_prefix(nfa, &chars[index..]) {
                if best.map_or(true, |(_, best_len)| len > best_len) {
                    best = Some((i, len));
                }
            }
        }
        let token = match best {
            Some((winner, len)) => Token {
                lexeme: chars[index..index + len].iter().collect(),
                pattern: Some(winner),
            },
            None => Token {
                lexeme: chars[index].to_string(),
                pattern: None,
            },
        };
        log::debug!("token {} at index {}", token, index);
        index += token.lexeme.chars().count();
        tokens.push(token);
    }
    tokens
}

pub fn render(tokens: &[Token]) -> String {
    tokens.iter().join("")
}

const OPERATORS: [char; 6] = ['(', ')', '*', '+', '?', '|'];

// The alphabet is the set of literal characters appearing in the patterns.
pub fn pattern_alphabet(patterns: &[&str]) -> HashSet<char> {
    patterns
        .iter()
        .flat_map(|pattern| pattern.chars())
        .filter(|c| !OPERATORS.contains(c))
        .collect()
}

// Compiles every pattern and scans the input. A malformed pattern fails the
// whole run, reported with its source text and 1-based position.
pub fn scan(input: &str, patterns: &[&str]) -> Result<Vec<Token>, PatternError> {
    let alphabet = pattern_alphabet(patterns);
    let mut automata = Vec::with_capacity(patterns.len());
    for (index, pattern) in patterns.iter().enumerate() {
        let nfa = compile(pattern, &alphabet).map_err(|source| PatternError {
            pattern: pattern.to_string(),
            index: index + 1,
            source,
        })?;
        automata.push(nfa);
    }
    Ok(tokenize(input, &automata))
}

#[cfg(test)]
use crate::error::SyntaxError;

#[test]
fn test_longest_match_wins() {
    let tokens = scan("aab", &["a+", "b"]).unwrap();
    assert_eq!(
        tokens,
        vec![
            Token {
                lexeme: "aa".to_string(),
                pattern: Some(0),
            },
            Token {
                lexeme: "b".to_string(),
                pattern: Some(1),
            },
        ]
    );
}

#[test]
fn test_unmatched_character_is_echoed() {
    let tokens = scan("ba", &["a"]).unwrap();
    assert_eq!(
        tokens,
        vec![
            Token {
                lexeme: "b".to_string(),
                pattern: None,
            },
            Token {
                lexeme: "a".to_string(),
                pattern: Some(0),
            },
        ]
    );
}

#[test]
fn test_first_pattern_wins_ties() {
    let tokens = scan("ab", &["ab", "a(b)"]).unwrap();
    assert_eq!(tokens.len(), 1);
    assert_eq!(tokens[0].pattern, Some(0));
}

#[test]
fn test_empty_match_never_emitted() {
    // "a*" accepts the empty string, but a token needs at least one symbol.
    let tokens = scan("ba", &["a*"]).unwrap();
    assert_eq!(tokens[0].pattern, None);
    assert_eq!(tokens[1].pattern, Some(0));
}

#[test]
fn test_longest_prefix_with_gap() {
    let alphabet = HashSet::from(['a']);
    let nfa = compile("a|aaa", &alphabet).unwrap();
    assert_eq!(longest_prefix(&nfa, &['a', 'a', 'a']), Some(3));
    assert_eq!(longest_prefix(&nfa, &['a', 'a']), Some(1));
    assert_eq!(longest_prefix(&nfa, &[]), None);
}

#[test]
fn test_render_tokens() {
    let tokens = scan("aab", &["a+", "b"]).unwrap();
    assert_eq!(render(&tokens), "<aa,1><b,2>");
}

#[test]
fn test_scan_is_idempotent() {
    let patterns = ["a+", "b", "(ab)*"];
    let first = render(&scan("aabbaabc", &patterns).unwrap());
    let second = render(&scan("aabbaabc", &patterns).unwrap());
    assert_eq!(first, second);
}

#[test]
fn test_scan_reports_offending_pattern() {
    let err = scan("ab", &["a", "(b"]).unwrap_err();
    assert_eq!(err.index, 2);
    assert_eq!(err.pattern, "(b");
    assert_eq!(err.source, SyntaxError::UnmatchedOpenParen);
}

#[cfg(test)]
mod oracle {
    use super::*;

    fn random_string(alphabet: &[char], max_len: usize) -> String {
        let len = rand::random::<usize>() % (max_len + 1);
        (0..len)
            .map(|_| alphabet[rand::random::<usize>() % alphabet.len()])
            .collect()
    }

    #[test]
    fn test_acceptance_agrees_with_regex_crate() {
        let patterns = ["a*b", "(a|b)+", "a?ba", "((ab)|b)*a"];
        let alphabet = HashSet::from(['a', 'b']);
        for pattern in patterns {
            let ours = compile(pattern, &alphabet).unwrap();
            let oracle = regex::Regex::new(&format!("^(?:{})$", pattern)).unwrap();
            for _ in 0..200 {
                let input = random_string(&['a', 'b'], 8);
                assert_eq!(
                    ours.accepts(&input),
                    oracle.is_match(&input),
                    "pattern {:?}, input {:?}",
                    pattern,
                    input
                );
            }
        }
    }

    #[test]
    fn test_tokenization_is_total() {
        let patterns = ["a+", "ab", "b*a"];
        for _ in 0..100 {
            let input = random_string(&['a', 'b', 'c'], 30);
            let tokens = scan(&input, &patterns).unwrap();
            let rebuilt: String = tokens.iter().map(|t| t.lexeme.as_str()).collect();
            assert_eq!(rebuilt, input);
        }
    }
}
