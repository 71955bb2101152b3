use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::sync::Arc;
use std::thread;

use super::{
    builtins, library, Callable, Chain, Channel, Closure, Frame, FuncLiteral, Node, Parser,
    Program, RefKind, Reference, Result, Scanner, ToyError, Value, MATCH_VALUE,
};

/// A tree-walking evaluator.
///
/// Cloning an `Interpreter` is cheap and every clone shares the same root
/// frame. Async tasks run on their own clone.
#[derive(Clone, Debug)]
pub struct Interpreter {
    globals: Arc<Frame>,
}

impl Default for Interpreter {
    fn default() -> Self {
        Interpreter::new()
    }
}

impl Interpreter {
    /// Creates an interpreter whose root frame holds the builtin runtime
    /// library.
    #[must_use]
    pub fn new() -> Self {
        let globals = Frame::new();
        builtins::inject(&globals);
        Interpreter { globals }
    }

    /// Like `new`, with `overlay` bound on top of the builtins. Entries
    /// holding a `Value::Lazy` node are evaluated each time they're
    /// referenced.
    #[must_use]
    pub fn with_globals(overlay: HashMap<String, Value>) -> Self {
        let interpreter = Interpreter::new();
        for (name, value) in overlay {
            interpreter.globals.define(name, value);
        }

        interpreter
    }

    #[must_use]
    pub fn globals(&self) -> &Arc<Frame> {
        &self.globals
    }

    /// Executes every top level statement in order against the root frame and
    /// returns the value of the last one. Stops at the first runtime error.
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn interpret(&self, program: &Program) -> Result<Value> {
        let mut last = Value::Nil;
        for statement in &program.body {
            last = self.execute(statement, &self.globals)?;
        }

        Ok(last)
    }

    pub fn execute(&self, node: &Node, frame: &Arc<Frame>) -> Result<Value> {
        tracing::trace!(kind = node.kind(), "execute");

        match node {
            Node::String(s) => Ok(Value::String(s.clone())),
            Node::Integer(n) => Ok(Value::Integer(*n)),
            Node::Boolean(b) => Ok(Value::Boolean(*b)),
            Node::List(elements) => {
                let items = elements
                    .iter()
                    .map(|element| self.execute(element, frame))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Value::list(items))
            }
            Node::Hash(entries) => {
                let mut store = BTreeMap::new();
                for (key, value) in entries {
                    store.insert(key.clone(), self.execute(value, frame)?);
                }
                Ok(Value::map(store))
            }
            Node::Func(func) => Ok(Value::Callable(Callable::Closure(Arc::new(Closure {
                func: Arc::clone(func),
                frame: Arc::clone(frame),
            })))),
            Node::Var(pairs) => {
                for (name, initializer) in pairs {
                    let value = self.execute(initializer, frame)?;
                    frame.define(name.clone(), value);
                }
                Ok(Value::Nil)
            }
            Node::Import(imports) => self.import(imports),
            // Exports are only honored while loading a module.
            Node::Export(_) => Ok(Value::Nil),
            Node::Reference(reference) => self.resolve(reference, frame),
            Node::Call(callee, args) => {
                let callable = match self.execute(callee, frame)? {
                    Value::Callable(callable) => callable,
                    other => return Err(ToyError::NotCallable(other.kind_name())),
                };

                let args = args
                    .iter()
                    .map(|arg| self.execute(arg, frame))
                    .collect::<Result<Vec<_>>>()?;

                self.call(&callable, args)
            }
            Node::Match(condition, cases) => self.match_cases(condition, cases, frame),
            Node::Seq(exprs) => self.execute_body(exprs, frame),
            Node::Chain(elements) => Ok(Value::Callable(Callable::Chain(Arc::new(Chain {
                elements: Arc::clone(elements),
                frame: Arc::clone(frame),
            })))),
            Node::Async(exprs) => self.spawn(exprs, frame),
            Node::Malformed(malformed) => Err(ToyError::MalformedNode(malformed.to_string())),
        }
    }

    /// Invokes `callable` with already evaluated arguments.
    pub fn call(&self, callable: &Callable, args: Vec<Value>) -> Result<Value> {
        match callable {
            Callable::Native(native) => (native.func)(self, args),
            Callable::Closure(closure) => self.call_func(&closure.func, &closure.frame, args),
            Callable::Chain(chain) => self.call_chain(chain, args),
        }
    }

    /// Binds `args` to the parameters by position in a fresh child of
    /// `enclosing`. Extra arguments are ignored and parameters without one
    /// stay unbound.
    fn call_func(
        &self,
        func: &FuncLiteral,
        enclosing: &Arc<Frame>,
        args: Vec<Value>,
    ) -> Result<Value> {
        let frame = Frame::child(enclosing);
        for (parameter, arg) in func.parameters.iter().zip(args) {
            frame.define(parameter.clone(), arg);
        }

        self.execute_body(&func.body, &frame)
    }

    fn execute_body(&self, body: &[Node], frame: &Arc<Frame>) -> Result<Value> {
        let mut last = Value::Nil;
        for expr in body {
            last = self.execute(expr, frame)?;
        }

        Ok(last)
    }

    fn resolve(&self, reference: &Reference, frame: &Arc<Frame>) -> Result<Value> {
        let value = match reference.kind {
            RefKind::Builtin => self.globals.get_local(&reference.name),
            RefKind::Declared => frame.lookup(&reference.name),
            RefKind::Imported => self.resolve_imported(&reference.name),
        }
        .ok_or_else(|| ToyError::UndefinedReference(reference.name.clone(), reference.kind))?;

        match value {
            Value::Lazy(node) => self.execute(&node, frame),
            value => Ok(value),
        }
    }

    /// `alias.name`: the alias in the root frame, then the name inside the
    /// module bound to it.
    fn resolve_imported(&self, name: &str) -> Option<Value> {
        let (alias, name) = name.split_once('.')?;
        match self.globals.get_local(alias)? {
            Value::Module(module) => module.get_local(name),
            _ => None,
        }
    }

    /// Evaluates every case in source order. A test that isn't a boolean
    /// literal and evaluates to `true` returns its action right away.
    /// Otherwise every action runs and the result is the action whose test
    /// equals the condition, with later cases winning.
    fn match_cases(
        &self,
        condition: &Node,
        cases: &[(Node, Node)],
        frame: &Arc<Frame>,
    ) -> Result<Value> {
        let value = self.execute(condition, frame)?;
        let scope = Frame::child(frame);
        scope.define(MATCH_VALUE, value.clone());

        let mut table: Vec<(Value, Value)> = Vec::with_capacity(cases.len());
        for (test, action) in cases {
            let key = self.execute(test, &scope)?;
            if !matches!(test, Node::Boolean(_)) && key == Value::Boolean(true) {
                return self.execute(action, &scope);
            }

            let result = self.execute(action, &scope)?;
            table.push((key, result));
        }

        Ok(table
            .into_iter()
            .rev()
            .find(|(key, _)| *key == value)
            .map_or(Value::Nil, |(_, result)| result))
    }

    /// Runs the first element with `args`, then feeds each result to the
    /// next element as its only argument.
    fn call_chain(&self, chain: &Chain, args: Vec<Value>) -> Result<Value> {
        let mut elements = chain.elements.iter();
        let mut result = match elements.next() {
            Some(first) => self.chain_step(first, &chain.frame, args)?,
            None => return Ok(Value::Nil),
        };

        for element in elements {
            result = self.chain_step(element, &chain.frame, vec![result])?;
        }

        Ok(result)
    }

    fn chain_step(&self, element: &Node, frame: &Arc<Frame>, args: Vec<Value>) -> Result<Value> {
        match element {
            Node::Func(func) => self.call_func(func, frame, args),
            Node::Reference(reference) => match self.resolve(reference, frame)? {
                Value::Callable(callable) => self.call(&callable, args),
                other => Err(ToyError::NotCallable(other.kind_name())),
            },
            other => Err(ToyError::InvalidChainElement(other.kind())),
        }
    }

    /// Starts a task that sends the value of each expression, in order, on
    /// the returned channel and then closes it.
    fn spawn(&self, exprs: &Arc<Vec<Node>>, frame: &Arc<Frame>) -> Result<Value> {
        let channel = Channel::new();
        let task = Task {
            interpreter: self.clone(),
            exprs: Arc::clone(exprs),
            frame: Arc::clone(frame),
            channel: channel.clone(),
        };

        thread::Builder::new()
            .name("toyscript-async".to_owned())
            .spawn(move || task.run())
            .map_err(|e| ToyError::Io(e.to_string()))?;

        tracing::debug!(expressions = exprs.len(), "spawned async task");
        Ok(Value::Channel(channel))
    }

    /// Binds every (alias, path) in the root frame, wherever the import
    /// appears.
    fn import(&self, imports: &[(String, String)]) -> Result<Value> {
        for (alias, path) in imports {
            let module = match library::module(alias) {
                Some(module) => module,
                None => self.load_module(alias, path)?,
            };

            tracing::debug!(%alias, %path, "imported module");
            self.globals.define(alias.clone(), Value::Module(module));
        }

        Ok(Value::Nil)
    }

    /// Runs the program at `path` in a fresh child of the root frame and
    /// returns a parentless frame of what its single export statement names.
    fn load_module(&self, alias: &str, path: &str) -> Result<Arc<Frame>> {
        let source = fs::read_to_string(path)
            .map_err(|e| ToyError::ImportFailed(path.to_owned(), e.to_string()))?;

        let (program, had_errors) = Parser::new(Scanner::new(source).scan_tokens()).parse();
        if had_errors {
            return Err(ToyError::ParseFailed(path.to_owned(), program.to_string()));
        }

        let exports = program.export_count();
        if exports != 1 {
            return Err(ToyError::ModuleExports(alias.to_owned(), exports));
        }

        let scope = Frame::child(&self.globals);
        let mut exported = None;
        for statement in &program.body {
            match statement {
                Node::Export(references) => {
                    let bindings = references
                        .iter()
                        .map(|r| -> Result<(String, Value)> {
                            Ok((r.name.clone(), self.resolve(r, &scope)?))
                        })
                        .collect::<Result<Vec<_>>>()?;
                    exported = Some(Arc::new(bindings.into_iter().collect::<Frame>()));
                }
                other => {
                    self.execute(other, &scope)?;
                }
            }
        }

        exported.ok_or_else(|| ToyError::ModuleExports(alias.to_owned(), 0))
    }
}

/// The state an async task owns on its thread.
struct Task {
    interpreter: Interpreter,
    exprs: Arc<Vec<Node>>,
    frame: Arc<Frame>,
    channel: Channel,
}

impl Task {
    fn run(self) {
        let outcome = self
            .exprs
            .iter()
            .try_for_each(|expr| {
                let value = self.interpreter.execute(expr, &self.frame)?;
                self.channel.send(value)
            })
            .and_then(|()| self.channel.close());

        match outcome {
            Ok(()) => tracing::debug!("async task finished"),
            Err(error) => {
                tracing::error!(%error, "async task failed");
                self.channel.fail(error);
            }
        }
    }
}
