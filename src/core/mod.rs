use std::error;
use std::result;
use std::sync::Arc;

mod builtins;
mod display;
mod environment;
mod interpreter;
mod library;
mod parser;
mod scanner;
mod value;

pub type Frame = environment::Frame;
pub type Interpreter = interpreter::Interpreter;
pub type Parser = parser::Parser;
pub type Result<T> = result::Result<T, ToyError>;
pub type Scanner = scanner::Scanner;

pub use value::{Callable, Chain, Channel, Closure, NativeFn, Value};

/// The name a `@match` binds its evaluated condition to.
pub const MATCH_VALUE: &str = "value";

/// Every way evaluation can fail.
///
/// Parse failures are not represented here. The parser reports those as
/// `Node::Malformed` values inside the tree it returns, together with an
/// aggregate error flag.
#[derive(Debug, Clone, PartialEq)]
pub enum ToyError {
    /// A reference could not be resolved in the frames its kind searches.
    UndefinedReference(String, RefKind),
    /// A call expression evaluated its callee to something that isn't a
    /// callable. Carries the kind of value that was found.
    NotCallable(&'static str),
    /// A builtin received an argument of the wrong kind.
    WrongKind {
        builtin: String,
        expected: &'static str,
        actual: &'static str,
    },
    /// A builtin was called with fewer arguments than it needs. The tuple is
    /// (builtin, zero based position of the missing argument).
    MissingArgument(String, usize),
    IndexOutOfBounds(i64, usize),
    DivisionByZero,
    /// Integer arithmetic in the named operator left the `i64` range.
    Overflow(&'static str),
    /// A send on, or a close of, a channel that is already closed.
    ChannelClosed,
    /// A chain element that is neither a function literal nor a reference.
    InvalidChainElement(&'static str),
    /// A module must carry exactly one export statement. The tuple is
    /// (alias, number of export statements found).
    ModuleExports(String, usize),
    /// The source file behind an import couldn't be read.
    ImportFailed(String, String),
    /// An imported module failed to parse. Carries the path and the AST dump.
    ParseFailed(String, String),
    Http(String, String),
    Json(String),
    Io(String),
    /// The evaluator met a node it must never see. This is a bug in whatever
    /// handed the tree over, not a user facing failure.
    MalformedNode(String),
}

impl error::Error for ToyError {}

#[derive(Clone, Debug, PartialEq)]
pub enum TokenType {
    // Punctuation
    LeftParen,
    RightParen,
    Comma,
    Dot,

    // Operator symbols. These double as builtin references in call position.
    Minus,
    Plus,
    Slash,
    Star,
    Bang,
    Equal,
    Less,
    Greater,

    // Words
    Builtin,
    Identifier,

    // Literals
    String(String),
    Number(i64),
    Boolean(bool),

    Comment,
    /// Input the scanner could not make sense of. Carries the diagnostic.
    Error(String),
    Eof,
}

impl TokenType {
    #[must_use]
    pub fn is_operator(&self) -> bool {
        matches!(
            self,
            Self::Minus
                | Self::Plus
                | Self::Slash
                | Self::Star
                | Self::Bang
                | Self::Equal
                | Self::Less
                | Self::Greater
        )
    }
}

/// The syntactic forms introduced by a builtin keyword in head position.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Form {
    Var,
    Import,
    Export,
    Func,
    List,
    Hash,
    Match,
    When,
    Seq,
    Chain,
    Async,
}

impl Form {
    #[must_use]
    pub fn from_keyword(keyword: &str) -> Option<Form> {
        match keyword {
            "@var" => Some(Form::Var),
            "@import" => Some(Form::Import),
            "@export" => Some(Form::Export),
            "@func" => Some(Form::Func),
            "@list" => Some(Form::List),
            "@hash" => Some(Form::Hash),
            "@match" => Some(Form::Match),
            "@when" => Some(Form::When),
            "@seq" => Some(Form::Seq),
            "@chain" => Some(Form::Chain),
            "@async" => Some(Form::Async),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    token_type: TokenType,
    lexeme: Arc<str>,
    line: usize,
}

impl Token {
    #[must_use]
    pub fn new(token_type: TokenType, lexeme: String, line: usize) -> Self {
        Token {
            token_type,
            lexeme: Arc::from(lexeme),
            line,
        }
    }

    #[must_use]
    pub fn token_type(&self) -> &TokenType {
        &self.token_type
    }

    #[must_use]
    pub fn lexeme(&self) -> &str {
        &self.lexeme
    }

    #[must_use]
    pub fn line(&self) -> usize {
        self.line
    }
}

/// How a reference is resolved. Fixed by the parser from the syntactic form
/// of the reference and never reinterpreted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefKind {
    /// `@name` or an operator symbol; looked up in the root frame only.
    Builtin,
    /// A plain identifier; looked up through the lexical frame chain.
    Declared,
    /// `alias.name`; the alias is looked up in the root frame, the name in
    /// the module frame bound to it.
    Imported,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Reference {
    pub name: String,
    pub kind: RefKind,
}

impl Reference {
    #[must_use]
    pub fn new(name: impl Into<String>, kind: RefKind) -> Self {
        Reference {
            name: name.into(),
            kind,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FuncLiteral {
    pub parameters: Vec<String>,
    pub body: Vec<Node>,
}

/// A placeholder the parser leaves where it couldn't build the node it
/// expected.
#[derive(Clone, Debug, PartialEq)]
pub struct Malformed {
    /// The offending token, when there is one.
    pub at: Option<Token>,
    pub message: String,
}

/// The abstract syntax tree.
///
/// Function, chain and async bodies sit behind an `Arc` because evaluating
/// them hands the body to a closure or a task that can outlive the tree.
#[derive(Clone, Debug, PartialEq)]
pub enum Node {
    String(String),
    Integer(i64),
    Boolean(bool),
    List(Vec<Node>),
    /// Keys are unique and kept in order of first appearance.
    Hash(Vec<(String, Node)>),
    Func(Arc<FuncLiteral>),
    Var(Vec<(String, Node)>),
    /// (alias, path) pairs.
    Import(Vec<(String, String)>),
    Export(Vec<Reference>),
    Reference(Reference),
    Call(Box<Node>, Vec<Node>),
    /// The condition and its (test, action) clauses in source order.
    Match(Box<Node>, Vec<(Node, Node)>),
    Seq(Vec<Node>),
    Chain(Arc<Vec<Node>>),
    Async(Arc<Vec<Node>>),
    Malformed(Malformed),
}

impl Node {
    pub(crate) fn malformed(at: Option<Token>, message: impl Into<String>) -> Self {
        Node::Malformed(Malformed {
            at,
            message: message.into(),
        })
    }

    /// The type tag of the variant.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::String(_) => "StringLiteral",
            Self::Integer(_) => "IntegerLiteral",
            Self::Boolean(_) => "BooleanLiteral",
            Self::List(_) => "ListLiteral",
            Self::Hash(_) => "HashLiteral",
            Self::Func(_) => "FuncLiteral",
            Self::Var(_) => "VarStatement",
            Self::Import(_) => "ImportStatement",
            Self::Export(_) => "ExportStatement",
            Self::Reference(_) => "Reference",
            Self::Call(..) => "Call",
            Self::Match(..) => "Match",
            Self::Seq(_) => "Seq",
            Self::Chain(_) => "Chain",
            Self::Async(_) => "Async",
            Self::Malformed(_) => "Malformed",
        }
    }

    #[must_use]
    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::Malformed(_))
    }
}

/// The top level statements of one source text.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Program {
    pub body: Vec<Node>,
}

impl Program {
    /// Number of export statements at the top level.
    #[must_use]
    pub fn export_count(&self) -> usize {
        self.body
            .iter()
            .filter(|node| matches!(node, Node::Export(_)))
            .count()
    }
}
