use std::io::BufRead;

use relex::automaton::compile;
use relex::tokenizer::pattern_alphabet;

// Reads a regex on the first line of stdin, then prints accepted/rejected
// for every following line.
fn main() {
    env_logger::init();
    let stdin = std::io::stdin();
    let mut lines = stdin.lock().lines();
    let pattern = match lines.next() {
        Some(line) => line.unwrap(),
        None => return,
    };

    let alphabet = pattern_alphabet(&[pattern.as_str()]);
    let nfa = match compile(&pattern, &alphabet) {
        Ok(nfa) => nfa,
        Err(err) => {
            eprintln!("{}", err);
            std::process::exit(1);
        }
    };

    for line in lines {
        if nfa.accepts(&line.unwrap()) {
            println!("accepted");
        } else {
            println!("rejected");
        }
    }
}
