use itertools::Itertools;
use relex::tokenizer::{render, scan};

fn main() {
    env_logger::init();
    let args = std::env::args().collect_vec();
    if args.len() < 2 {
        eprintln!("usage: {} <pattern file> [output file]", args[0]);
        std::process::exit(2);
    }

    let source = match std::fs::read_to_string(&args[1]) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("{}: {}", args[1], err);
            std::process::exit(1);
        }
    };
    let mut lines = source.lines();
    let input = lines.next().unwrap_or("");
    let patterns = lines.filter(|line| !line.is_empty()).collect_vec();
    log::debug!("input {:?}, {} patterns", input, patterns.len());

    match scan(input, &patterns) {
        Ok(tokens) => {
            let output = render(&tokens);
            match args.get(2) {
                Some(path) => {
                    if let Err(err) = std::fs::write(path, &output) {
                        eprintln!("{}: {}", path, err);
                        std::process::exit(1);
                    }
                }
                None => println!("{}", output),
            }
        }
        Err(err) => {
            eprintln!("{}", err);
            std::process::exit(1);
        }
    }
}
