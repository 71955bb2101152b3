//! The modules an `@import` resolves by alias instead of by path.

use std::io::{self, BufRead, Read, Write};
use std::sync::Arc;

use super::builtins::{argument, string, wrong_kind};
use super::value::NativeFnPtr;
use super::{Frame, Interpreter, Result, ToyError, Value};

type Export = (&'static str, &'static str, NativeFnPtr);

const HTTP: &[Export] = &[("get", "http.get", http_get)];
const JSON: &[Export] = &[("parse", "json.parse", json_parse)];
const STDIO: &[Export] = &[
    ("print", "stdio.print", stdio_print),
    ("read", "stdio.read", stdio_read),
    ("string", "stdio.string", stdio_string),
];

/// The module frame for a well-known alias, or `None` when `alias` names
/// something to load from disk.
pub(crate) fn module(alias: &str) -> Option<Arc<Frame>> {
    let exports = match alias {
        "http" => HTTP,
        "json" => JSON,
        "stdio" => STDIO,
        _ => return None,
    };

    Some(Arc::new(
        exports
            .iter()
            .map(|(name, qualified, func)| ((*name).to_owned(), Value::native(*qualified, *func)))
            .collect(),
    ))
}

/// Fetches `url` and returns the raw response body.
fn http_get(_: &Interpreter, args: Vec<Value>) -> Result<Value> {
    let url = string("http.get", &args, 0)?;
    tracing::debug!(%url, "http.get");

    let response = ureq::get(url)
        .call()
        .map_err(|e| ToyError::Http(url.to_owned(), e.to_string()))?;

    let mut body = Vec::new();
    response
        .into_reader()
        .read_to_end(&mut body)
        .map_err(|e| ToyError::Http(url.to_owned(), e.to_string()))?;

    Ok(Value::Bytes(body.into()))
}

fn json_parse(_: &Interpreter, args: Vec<Value>) -> Result<Value> {
    let parsed: serde_json::Value = match argument("json.parse", &args, 0)? {
        Value::Bytes(bytes) => serde_json::from_slice(bytes),
        Value::String(s) => serde_json::from_str(s),
        other => return Err(wrong_kind("json.parse", "bytes or a string", other)),
    }
    .map_err(|e| ToyError::Json(e.to_string()))?;

    Ok(from_json(parsed))
}

fn from_json(json: serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Nil,
        serde_json::Value::Bool(b) => Value::Boolean(b),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(n) => Value::Integer(n),
            None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
        },
        serde_json::Value::String(s) => Value::String(s),
        serde_json::Value::Array(items) => {
            Value::list(items.into_iter().map(from_json).collect())
        }
        serde_json::Value::Object(entries) => Value::map(
            entries
                .into_iter()
                .map(|(key, value)| (key, from_json(value)))
                .collect(),
        ),
    }
}

/// Writes the arguments to stdout on one line, separated by spaces.
fn stdio_print(_: &Interpreter, args: Vec<Value>) -> Result<Value> {
    let line = args
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" ");

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    writeln!(handle, "{}", line).map_err(|e| ToyError::Io(e.to_string()))?;

    Ok(Value::Nil)
}

/// Reads one line from stdin with surrounding whitespace trimmed.
fn stdio_read(_: &Interpreter, _: Vec<Value>) -> Result<Value> {
    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .map_err(|e| ToyError::Io(e.to_string()))?;

    Ok(Value::String(line.trim().to_owned()))
}

/// Concatenates string arguments, skipping nil.
fn stdio_string(_: &Interpreter, args: Vec<Value>) -> Result<Value> {
    args.iter()
        .try_fold(String::new(), |mut joined, arg| match arg {
            Value::Nil => Ok(joined),
            Value::String(s) => {
                joined.push_str(s);
                Ok(joined)
            }
            other => Err(wrong_kind("stdio.string", "a string", other)),
        })
        .map(Value::String)
}
