use std::fmt;
use std::result;

use super::value::{address, read};
use super::{
    Callable, Channel, Malformed, Node, Program, RefKind, Reference, ToyError, Token, TokenType,
    Value,
};

impl fmt::Display for ToyError {
    fn fmt(&self, f: &mut fmt::Formatter) -> result::Result<(), fmt::Error> {
        match self {
            Self::UndefinedReference(name, kind) => {
                write!(f, "runtime error: Undefined {} reference '{}'.", kind, name)
            }
            Self::NotCallable(kind) => write!(
                f,
                "runtime error: Can only call functions and chains, got {}.",
                kind
            ),
            Self::WrongKind {
                builtin,
                expected,
                actual,
            } => write!(
                f,
                "runtime error: {} expects {} but got {}.",
                builtin, expected, actual
            ),
            Self::MissingArgument(builtin, position) => write!(
                f,
                "runtime error: {} is missing argument {}.",
                builtin,
                position + 1
            ),
            Self::IndexOutOfBounds(index, len) => write!(
                f,
                "runtime error: Index {} is out of bounds for a list of length {}.",
                index, len
            ),
            Self::DivisionByZero => write!(f, "runtime error: Division by zero."),
            Self::Overflow(operator) => {
                write!(f, "runtime error: Integer overflow in '{}'.", operator)
            }
            Self::ChannelClosed => write!(f, "runtime error: Channel is closed."),
            Self::InvalidChainElement(kind) => write!(
                f,
                "runtime error: Chains can only hold functions and references, got {}.",
                kind
            ),
            Self::ModuleExports(alias, count) => write!(
                f,
                "runtime error: Module '{}' must have exactly one export statement, found {}.",
                alias, count
            ),
            Self::ImportFailed(path, reason) => {
                write!(f, "runtime error: Failed to read import '{}': {}", path, reason)
            }
            Self::ParseFailed(path, dump) => {
                write!(f, "runtime error: Failed to parse import '{}'\n\n{}", path, dump)
            }
            Self::Http(url, reason) => {
                write!(f, "runtime error: http.get failed for '{}': {}", url, reason)
            }
            Self::Json(reason) => write!(f, "runtime error: json.parse: {}", reason),
            Self::Io(reason) => write!(f, "runtime error: {}", reason),
            Self::MalformedNode(node) => write!(
                f,
                "internal error: Malformed node reached the evaluator: {}",
                node
            ),
        }
    }
}

impl fmt::Display for RefKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> result::Result<(), fmt::Error> {
        let kind = match self {
            Self::Builtin => "builtin",
            Self::Declared => "declared",
            Self::Imported => "imported",
        };

        write!(f, "{}", kind)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter) -> result::Result<(), fmt::Error> {
        write!(f, "{} '{}' at line {}", self.token_type, self.lexeme, self.line)
    }
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter) -> result::Result<(), fmt::Error> {
        let token = match self {
            Self::LeftParen => "(",
            Self::RightParen => ")",
            Self::Comma => ",",
            Self::Dot => ".",
            Self::Minus => "-",
            Self::Plus => "+",
            Self::Slash => "/",
            Self::Star => "*",
            Self::Bang => "!",
            Self::Equal => "=",
            Self::Less => "<",
            Self::Greater => ">",
            Self::Builtin => "builtin",
            Self::Identifier => "identifier",
            Self::String(_) => "string",
            Self::Number(_) => "number",
            Self::Boolean(_) => "boolean",
            Self::Comment => "comment",
            Self::Error(message) => return write!(f, "error ({})", message),
            Self::Eof => "end-of-file",
        };

        write!(f, "{}", token)
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter) -> result::Result<(), fmt::Error> {
        write!(f, "<{} {}>", self.kind, self.name)
    }
}

impl fmt::Display for Malformed {
    fn fmt(&self, f: &mut fmt::Formatter) -> result::Result<(), fmt::Error> {
        match &self.at {
            Some(token) => write!(f, "<error: {} at {}>", self.message, token),
            None => write!(f, "<error: {}>", self.message),
        }
    }
}

/// A one line, s-expression shaped dump of the node. Malformed nodes show
/// their diagnostic in place.
impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter) -> result::Result<(), fmt::Error> {
        match self {
            Self::String(s) => write!(f, "\"{}\"", s),
            Self::Integer(n) => write!(f, "{}", n),
            Self::Boolean(b) => write!(f, "{}", b),
            Self::List(elements) => write_form(f, "list", elements),
            Self::Hash(entries) => {
                write!(f, "(hash")?;
                for (key, value) in entries {
                    write!(f, " (\"{}\" {})", key, value)?;
                }
                write!(f, ")")
            }
            Self::Func(func) => {
                write!(f, "(func ({})", func.parameters.join(" "))?;
                for expr in &func.body {
                    write!(f, " {}", expr)?;
                }
                write!(f, ")")
            }
            Self::Var(pairs) => {
                write!(f, "(var")?;
                for (name, value) in pairs {
                    write!(f, " ({} {})", name, value)?;
                }
                write!(f, ")")
            }
            Self::Import(pairs) => {
                write!(f, "(import")?;
                for (alias, path) in pairs {
                    write!(f, " ({} \"{}\")", alias, path)?;
                }
                write!(f, ")")
            }
            Self::Export(references) => {
                write!(f, "(export")?;
                for reference in references {
                    write!(f, " {}", reference)?;
                }
                write!(f, ")")
            }
            Self::Reference(reference) => write!(f, "{}", reference),
            Self::Call(callee, args) => {
                write!(f, "(call {}", callee)?;
                for arg in args {
                    write!(f, " {}", arg)?;
                }
                write!(f, ")")
            }
            Self::Match(condition, cases) => {
                write!(f, "(match {}", condition)?;
                for (test, action) in cases {
                    write!(f, " (when {} {})", test, action)?;
                }
                write!(f, ")")
            }
            Self::Seq(exprs) => write_form(f, "seq", exprs),
            Self::Chain(exprs) => write_form(f, "chain", exprs),
            Self::Async(exprs) => write_form(f, "async", exprs),
            Self::Malformed(malformed) => write!(f, "{}", malformed),
        }
    }
}

fn write_form(f: &mut fmt::Formatter, name: &str, nodes: &[Node]) -> fmt::Result {
    write!(f, "({}", name)?;
    for node in nodes {
        write!(f, " {}", node)?;
    }
    write!(f, ")")
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter) -> result::Result<(), fmt::Error> {
        writeln!(f, "(program")?;
        for statement in &self.body {
            writeln!(f, "  {}", statement)?;
        }
        write!(f, ")")
    }
}

impl fmt::Display for Callable {
    fn fmt(&self, f: &mut fmt::Formatter) -> result::Result<(), fmt::Error> {
        match self {
            Self::Closure(closure) => write!(f, "<fn ({})>", closure.parameters().join(" ")),
            Self::Chain(chain) => write!(f, "<chain of {}>", chain.len()),
            Self::Native(native) => write!(f, "<native fn {}>", native.name),
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter) -> result::Result<(), fmt::Error> {
        if self.is_closed() {
            write!(f, "<closed channel>")
        } else {
            write!(f, "<channel>")
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> result::Result<(), fmt::Error> {
        render(self, f, &mut Vec::new())
    }
}

/// `open` holds the lists and maps printed further up. A collection that
/// contains itself prints as `[...]` or `{...}` where it recurs.
fn render(
    value: &Value,
    f: &mut fmt::Formatter,
    open: &mut Vec<usize>,
) -> result::Result<(), fmt::Error> {
    match value {
        Value::Nil => write!(f, "nil"),
        Value::Boolean(b) => write!(f, "{}", b),
        Value::Integer(n) => write!(f, "{}", n),
        Value::Float(n) => write!(f, "{}", n),
        Value::String(s) => write!(f, "{}", s),
        Value::Bytes(bytes) => write!(f, "{}", String::from_utf8_lossy(bytes)),
        Value::List(items) => {
            let id = address(items);
            if open.contains(&id) {
                return write!(f, "[...]");
            }

            let items = read(items).clone();
            open.push(id);
            write!(f, "[")?;
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    write!(f, " ")?;
                }
                render(item, f, open)?;
            }
            open.pop();
            write!(f, "]")
        }
        Value::Map(entries) => {
            let id = address(entries);
            if open.contains(&id) {
                return write!(f, "{{...}}");
            }

            let entries = read(entries).clone();
            open.push(id);
            write!(f, "{{")?;
            for (i, (key, value)) in entries.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}: ", key)?;
                render(value, f, open)?;
            }
            open.pop();
            write!(f, "}}")
        }
        Value::Callable(c) => write!(f, "{}", c),
        Value::Module(frame) => write!(f, "<module {}>", frame.names().join(" ")),
        Value::Channel(channel) => write!(f, "{}", channel),
        Value::Lazy(node) => write!(f, "<lazy {}>", node.kind()),
    }
}
