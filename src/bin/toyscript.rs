use std::env;
use std::error;
use std::fs;
use std::io::{self, stdin, BufRead, Write};
use std::result;

use program::perror;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter, Registry};

use toyscript::core::{Interpreter, Parser, Scanner, Value};

type Error = Box<dyn error::Error>;
type Result<T> = result::Result<T, Error>;

const USAGE: &str = "usage: toyscript [run <script> | build <script>]";

/// Logs go to stderr so that scripts own stdout. `TOYSCRIPT_LOG` takes
/// `EnvFilter` directives and defaults to `warn`.
fn init_tracing() -> Result<()> {
    let filter =
        EnvFilter::try_from_env("TOYSCRIPT_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    let subscriber = Registry::default()
        .with(filter)
        .with(fmt::layer().with_writer(io::stderr));

    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

/// Scans, parses and evaluates `source` with a fresh interpreter. A program
/// that fails to parse is never evaluated.
fn run(source: String) -> Result<Value> {
    let scanner = Scanner::new(source);
    let parser = Parser::new(scanner.scan_tokens());
    let (program, had_errors) = parser.parse();
    if had_errors {
        return Err(format!("parsing error:\n\n{}", program).into());
    }

    let interpreter = Interpreter::new();
    Ok(interpreter.interpret(&program)?)
}

fn run_prompt() -> Result<()> {
    println!("toyscript {} (type `exit` or an empty line to quit)", env!("CARGO_PKG_VERSION"));

    let stdin = stdin();
    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut buf = String::with_capacity(1024);
        if stdin.lock().read_line(&mut buf)? == 0 {
            return Ok(());
        }

        let line = buf.trim();
        if line.is_empty() || line == "exit" {
            return Ok(());
        }

        // Each line stands alone, and an error doesn't end the session.
        match run(line.to_owned()) {
            Ok(Value::Nil) => {}
            Ok(value) => println!("{}", value),
            Err(e) => eprintln!("{}", e),
        }
    }
}

fn run_file(path: &str) -> Result<()> {
    let source = fs::read_to_string(path)?;
    run(source)?;
    Ok(())
}

fn fail_if_err(r: Result<()>) {
    if let Err(e) = r {
        perror(e)
    }
}

fn main() {
    fail_if_err(init_tracing());

    let args: Vec<String> = env::args().collect();
    match args.get(1).map(String::as_str) {
        None => fail_if_err(run_prompt()),
        Some("run") => match args.get(2) {
            Some(path) => fail_if_err(run_file(path)),
            None => perror(USAGE.to_owned()),
        },
        Some("build") => perror("build: not implemented".to_owned()),
        Some(_) => perror(USAGE.to_owned()),
    }
}
