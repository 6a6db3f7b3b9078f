use std::collections::{HashMap, HashSet, VecDeque};

use itertools::Itertools;

use crate::error::SyntaxError;
use crate::postfix::{self, CONCAT};

// Epsilon transitions are stored under ' '; the alphabet must never contain it.
pub const EPSILON: char = ' ';

// States carry no names, only their position in the transition table.
pub type State = usize;

pub type TransitionRow = HashMap<char, HashSet<State>>;

fn shifted_row(row: &TransitionRow, offset: usize) -> TransitionRow {
    row.iter()
        .map(|(symbol, dests)| (*symbol, dests.iter().map(|d| d + offset).collect()))
        .collect()
}

fn merge_row(dst: &mut TransitionRow, src: &TransitionRow) {
    for (symbol, dests) in src {
        dst.entry(*symbol).or_default().extend(dests);
    }
}

fn add_epsilon(row: &mut TransitionRow, to: State) {
    row.entry(EPSILON).or_default().insert(to);
}

// State 0 is the entry and the last state the unique exit, until composition
// merges fragments (the composite restores the same convention).
#[derive(Debug, Clone)]
pub struct EpsilonNfa {
    pub transitions: Vec<TransitionRow>,
}

impl EpsilonNfa {
    pub fn state_count(&self) -> usize {
        self.transitions.len()
    }

    pub fn literal(c: char) -> EpsilonNfa {
        let mut entry = TransitionRow::new();
        entry.insert(c, HashSet::from([1]));
        EpsilonNfa {
            transitions: vec![entry, TransitionRow::new()],
        }
    }

    // The exit of `self` is fused with the entry of `other`; any transitions
    // already attached to the exit are unioned with the entry's.
    pub fn concat(self, other: EpsilonNfa) -> EpsilonNfa {
        let offset = self.state_count() - 1;
        let mut rows = self.transitions;
        let exit_row = rows.pop().unwrap();
        rows.extend(other.transitions.iter().map(|row| shifted_row(row, offset)));
        merge_row(&mut rows[offset], &exit_row);
        EpsilonNfa { transitions: rows }
    }

    // The entry of `self` doubles as the entry of the union; the renumbered
    // exit of `other` becomes the shared exit.
    pub fn alternate(self, other: EpsilonNfa) -> EpsilonNfa {
        let offset = self.state_count();
        let last = offset + other.state_count() - 1;
        let mut rows = self.transitions;
        add_epsilon(&mut rows[0], offset);
        rows.extend(other.transitions.iter().map(|row| shifted_row(row, offset)));
        add_epsilon(&mut rows[offset - 1], last);
        EpsilonNfa { transitions: rows }
    }

    pub fn star(self) -> EpsilonNfa {
        let inner = self.state_count();
        let mut rows = Vec::with_capacity(inner + 2);
        let mut entry = TransitionRow::new();
        entry.insert(EPSILON, HashSet::from([1, inner + 1]));
        rows.push(entry);
        rows.extend(self.transitions.iter().map(|row| shifted_row(row, 1)));
        let mut exit = TransitionRow::new();
        exit.insert(EPSILON, HashSet::from([0]));
        rows.push(exit);
        add_epsilon(&mut rows[inner], inner + 1);
        EpsilonNfa { transitions: rows }
    }

    // One-or-more: the operand is consumed and rewired in place.
    pub fn plus(mut self) -> EpsilonNfa {
        let exit = self.state_count() - 1;
        add_epsilon(&mut self.transitions[exit], 0);
        self
    }

    // Zero-or-one: the operand is consumed and rewired in place.
    pub fn optional(mut self) -> EpsilonNfa {
        let exit = self.state_count() - 1;
        add_epsilon(&mut self.transitions[0], exit);
        self
    }

    pub fn from_postfix(tokens: &str) -> Result<EpsilonNfa, SyntaxError> {
        let mut stack: Vec<EpsilonNfa> = vec![];
        for c in tokens.chars() {
            match c {
                '*' => {
                    let a = stack.pop().ok_or(SyntaxError::MissingOperand('*'))?;
                    stack.push(a.star());
                }
                '+' => {
                    let a = stack.pop().ok_or(SyntaxError::MissingOperand('+'))?;
                    stack.push(a.plus());
                }
                '?' => {
                    let a = stack.pop().ok_or(SyntaxError::MissingOperand('?'))?;
                    stack.push(a.optional());
                }
                '|' => {
                    let b = stack.pop().ok_or(SyntaxError::MissingOperand('|'))?;
                    let a = stack.pop().ok_or(SyntaxError::MissingOperand('|'))?;
                    stack.push(a.alternate(b));
                }
                CONCAT => {
                    let b = stack.pop().ok_or(SyntaxError::MissingOperand(CONCAT))?;
                    let a = stack.pop().ok_or(SyntaxError::MissingOperand(CONCAT))?;
                    stack.push(a.concat(b));
                }
                _ => stack.push(EpsilonNfa::literal(c)),
            }
        }
        let nfa = stack.pop().ok_or(SyntaxError::EmptyPattern)?;
        if !stack.is_empty() {
            return Err(SyntaxError::DanglingOperands(stack.len() + 1));
        }
        Ok(nfa)
    }

    pub fn epsilon_closure(&self, states: &HashSet<State>) -> HashSet<State> {
        let mut closure = states.clone();
        let mut queue: VecDeque<State> = states.iter().copied().collect();
        while let Some(state) = queue.pop_front() {
            if let Some(dests) = self.transitions[state].get(&EPSILON) {
                for &dest in dests {
                    if closure.insert(dest) {
                        queue.push_back(dest);
                    }
                }
            }
        }
        closure
    }

    pub fn eliminate(&self, alphabet: &HashSet<char>) -> Nfa {
        let exit = self.state_count() - 1;
        let mut final_states = HashSet::from([exit]);

        let mut rows = Vec::with_capacity(self.state_count());
        for state in 0..self.state_count() {
            let closure = self.epsilon_closure(&HashSet::from([state]));
            let mut row = TransitionRow::new();
            for &symbol in alphabet {
                if symbol == EPSILON {
                    continue;
                }
                let mut dests: HashSet<State> = HashSet::new();
                for &reachable in &closure {
                    if let Some(targets) = self.transitions[reachable].get(&symbol) {
                        dests.extend(targets);
                    }
                }
                let dests = self.epsilon_closure(&dests);
                // Absence of an entry, not an empty set, marks "no transition".
                if !dests.is_empty() {
                    row.insert(symbol, dests);
                }
            }
            rows.push(row);
        }

        // The automaton accepts the empty string iff the entry's closure
        // already reaches the exit.
        if self.epsilon_closure(&HashSet::from([0])).contains(&exit) {
            final_states.insert(0);
        }

        Nfa {
            transitions: rows,
            final_states,
        }
    }

    pub fn to_dot(&self) -> String {
        render_dot(&self.transitions, &HashSet::from([self.state_count() - 1]))
    }

    pub fn show_dot(&self, base_name: &str) {
        write_dot(&self.to_dot(), base_name);
    }
}

// Epsilon-free, still nondeterministic: a symbol may lead to several states.
#[derive(Debug, Clone)]
pub struct Nfa {
    pub transitions: Vec<TransitionRow>,
    pub final_states: HashSet<State>,
}

impl Nfa {
    pub fn state_count(&self) -> usize {
        self.transitions.len()
    }

    pub fn step(&self, active: &HashSet<State>, symbol: char) -> HashSet<State> {
        let mut next = HashSet::new();
        for &state in active {
            if let Some(dests) = self.transitions[state].get(&symbol) {
                next.extend(dests);
            }
        }
        next
    }

    pub fn accepts(&self, input: &str) -> bool {
        let mut active = HashSet::from([0]);
        for c in input.chars() {
            active = self.step(&active, c);
        }
        active.iter().any(|state| self.final_states.contains(state))
    }

    pub fn to_dot(&self) -> String {
        render_dot(&self.transitions, &self.final_states)
    }

    pub fn show_dot(&self, base_name: &str) {
        write_dot(&self.to_dot(), base_name);
    }
}

pub fn compile(pattern: &str, alphabet: &HashSet<char>) -> Result<Nfa, SyntaxError> {
    let tokens = postfix::to_postfix(pattern)?;
    log::debug!("pattern {:?} -> postfix {:?}", pattern, tokens);
    let fragment = EpsilonNfa::from_postfix(&tokens)?;
    let nfa = fragment.eliminate(alphabet);
    log::debug!(
        "pattern {:?}: {} states, {} final",
        pattern,
        nfa.state_count(),
        nfa.final_states.len()
    );
    Ok(nfa)
}

fn render_dot(transitions: &[TransitionRow], final_states: &HashSet<State>) -> String {
    let mut dot = String::new();
    dot.push_str("digraph {\n");
    for (from, row) in transitions.iter().enumerate() {
        for (symbol, dests) in row.iter().sorted_by_key(|(symbol, _)| **symbol) {
            let label = if *symbol == EPSILON {
                "eps".to_string()
            } else {
                symbol.to_string()
            };
            for to in dests.iter().sorted() {
                dot.push_str(&format!("{} -> {} [label=\"{}\"]\n", from, to, label));
            }
        }
    }
    for state in final_states.iter().sorted() {
        dot.push_str(&format!("{} [shape=doublecircle]\n", state));
    }
    dot.push_str("start [shape=point]\n");
    dot.push_str("start -> 0\n");
    dot.push_str("}\n");
    dot
}

fn write_dot(dot: &str, base_name: &str) {
    let dot_name = format!("{}.dot", base_name);
    std::fs::write(&dot_name, dot).unwrap();
    let output = std::process::Command::new("dot")
        .arg("-Tpng")
        .arg(&dot_name)
        .arg("-o")
        .arg(format!("{}.png", base_name))
        .output()
        .unwrap();
    println!("{}", String::from_utf8_lossy(&output.stdout));
}

#[cfg(test)]
fn ab_alphabet() -> HashSet<char> {
    HashSet::from(['a', 'b'])
}

#[test]
fn test_literal_fragment() {
    let nfa = EpsilonNfa::literal('a');
    assert_eq!(nfa.state_count(), 2);
    assert_eq!(nfa.transitions[0][&'a'], HashSet::from([1]));
    assert!(nfa.transitions[1].is_empty());
}

#[test]
fn test_composition_state_counts() {
    let a = EpsilonNfa::literal('a');
    let b = EpsilonNfa::literal('b');
    assert_eq!(a.clone().concat(b.clone()).state_count(), 3);
    assert_eq!(a.clone().alternate(b).state_count(), 4);
    assert_eq!(a.clone().star().state_count(), 4);
    assert_eq!(a.clone().plus().state_count(), 2);
    assert_eq!(a.optional().state_count(), 2);
}

#[test]
fn test_literal_acceptance() {
    let nfa = compile("a", &ab_alphabet()).unwrap();
    assert!(nfa.accepts("a"));
    assert!(!nfa.accepts(""));
    assert!(!nfa.accepts("aa"));
    assert!(!nfa.accepts("b"));
}

#[test]
fn test_star_acceptance() {
    let nfa = compile("a*", &ab_alphabet()).unwrap();
    assert!(nfa.accepts(""));
    assert!(nfa.accepts("a"));
    assert!(nfa.accepts("aaaa"));
    assert!(!nfa.accepts("b"));
    assert!(!nfa.accepts("ab"));
}

#[test]
fn test_plus_acceptance() {
    let nfa = compile("a+", &ab_alphabet()).unwrap();
    assert!(!nfa.accepts(""));
    assert!(nfa.accepts("a"));
    assert!(nfa.accepts("aaa"));
    assert!(!nfa.accepts("ab"));
}

#[test]
fn test_optional_acceptance() {
    let nfa = compile("a?", &ab_alphabet()).unwrap();
    assert!(nfa.accepts(""));
    assert!(nfa.accepts("a"));
    assert!(!nfa.accepts("aa"));
}

#[test]
fn test_alternation_acceptance() {
    let nfa = compile("a|b", &ab_alphabet()).unwrap();
    assert!(nfa.accepts("a"));
    assert!(nfa.accepts("b"));
    assert!(!nfa.accepts(""));
    assert!(!nfa.accepts("ab"));
}

#[test]
fn test_empty_string_final_state() {
    let nfa = compile("a*", &ab_alphabet()).unwrap();
    assert!(nfa.final_states.contains(&0));
}

#[test]
fn test_epsilon_closure_chain() {
    let mut rows = vec![
        TransitionRow::new(),
        TransitionRow::new(),
        TransitionRow::new(),
    ];
    add_epsilon(&mut rows[0], 1);
    add_epsilon(&mut rows[1], 2);
    let nfa = EpsilonNfa { transitions: rows };
    assert_eq!(
        nfa.epsilon_closure(&HashSet::from([0])),
        HashSet::from([0, 1, 2])
    );
    // No epsilon entry on the exit state: the closure is just itself.
    assert_eq!(nfa.epsilon_closure(&HashSet::from([2])), HashSet::from([2]));
    assert!(nfa.epsilon_closure(&HashSet::new()).is_empty());
}

#[cfg(test)]
fn all_strings(alphabet: &[char], max_len: usize) -> Vec<String> {
    let mut ret = vec![String::new()];
    let mut level = vec![String::new()];
    for _ in 0..max_len {
        level = level
            .iter()
            .flat_map(|s| alphabet.iter().map(move |c| format!("{}{}", s, c)))
            .collect_vec();
        ret.extend(level.clone());
    }
    ret
}

#[test]
fn test_concat_associativity() {
    let alphabet = HashSet::from(['a', 'b', 'c']);
    let left = compile("(ab)c", &alphabet).unwrap();
    let right = compile("a(bc)", &alphabet).unwrap();
    for s in all_strings(&['a', 'b', 'c'], 4) {
        assert_eq!(left.accepts(&s), right.accepts(&s), "input {:?}", s);
    }
}

#[test]
fn test_fully_parenthesized_regex() {
    // a(a|b)*ab: accepts exactly the strings starting with 'a' and ending "ab".
    let nfa = compile("(((a)(((a)|(b))*))((a)(b)))", &ab_alphabet()).unwrap();
    assert!(nfa.accepts("abbab"));
    assert!(nfa.accepts("aab"));
    assert!(!nfa.accepts("ab"));
    assert!(!nfa.accepts("abba"));
    assert!(!nfa.accepts("abbaba"));
}

#[test]
fn test_fully_parenthesized_regex_swapped_tail() {
    // a(a|b)*ba: same shape with the tail group reversed.
    let nfa = compile("(((a)(((a)|(b))*))((b)(a)))", &ab_alphabet()).unwrap();
    assert!(nfa.accepts("aba"));
    assert!(nfa.accepts("abba"));
    assert!(nfa.accepts("abbaba"));
    assert!(!nfa.accepts("ab"));
    assert!(!nfa.accepts("abbab"));
}

#[test]
fn test_symbol_outside_alphabet_rejects() {
    let nfa = compile("a", &ab_alphabet()).unwrap();
    assert!(!nfa.accepts("c"));
}

#[test]
fn test_from_postfix_errors() {
    assert_eq!(
        EpsilonNfa::from_postfix("").unwrap_err(),
        SyntaxError::EmptyPattern
    );
    assert_eq!(
        EpsilonNfa::from_postfix("a|").unwrap_err(),
        SyntaxError::MissingOperand('|')
    );
    assert_eq!(
        EpsilonNfa::from_postfix("ab").unwrap_err(),
        SyntaxError::DanglingOperands(2)
    );
}

#[test]
fn test_compile_reports_syntax_errors() {
    let alphabet = ab_alphabet();
    assert_eq!(
        compile("a)", &alphabet).unwrap_err(),
        SyntaxError::UnmatchedCloseParen
    );
    assert_eq!(
        compile("(a", &alphabet).unwrap_err(),
        SyntaxError::UnmatchedOpenParen
    );
    assert_eq!(compile("", &alphabet).unwrap_err(), SyntaxError::EmptyPattern);
}
