pub mod automaton;
pub mod error;
pub mod postfix;
pub mod tokenizer;

use wasm_bindgen::prelude::*;

// Pattern-file shape: first line is the text to scan, each following
// non-empty line is one pattern.
#[wasm_bindgen]
pub fn tokenize_source(source: &str) -> String {
    let mut lines = source.lines();
    let input = lines.next().unwrap_or("");
    let patterns = lines.filter(|line| !line.is_empty()).collect::<Vec<_>>();
    match tokenizer::scan(input, &patterns) {
        Ok(tokens) => tokenizer::render(&tokens),
        Err(err) => format!("error: {}", err),
    }
}
