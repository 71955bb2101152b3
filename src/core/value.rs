use std::collections::BTreeMap;
use std::fmt;
use std::sync::{
    Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard,
};

use crossbeam::channel::{self, Receiver, Sender, TrySendError};

use super::{Frame, FuncLiteral, Interpreter, Node, Result, ToyError};

/// A run-time value.
///
/// Lists and maps are shared mutable storage: cloning a `Value::List` clones
/// the handle, not the elements, so every holder observes every write. The
/// runtime does not guard concurrent mutation of the same list or map from
/// two async tasks beyond keeping each individual read or write atomic;
/// interleaving is up to the program.
#[derive(Clone, Debug)]
pub enum Value {
    Nil,
    Boolean(bool),
    Integer(i64),
    /// Only produced by `json.parse` for numbers that don't fit an `i64`.
    Float(f64),
    String(String),
    Bytes(Arc<[u8]>),
    List(Arc<RwLock<Vec<Value>>>),
    Map(Arc<RwLock<BTreeMap<String, Value>>>),
    Callable(Callable),
    /// A parentless frame holding a module's exported bindings.
    Module(Arc<Frame>),
    Channel(Channel),
    /// A node evaluated each time the binding holding it is referenced.
    Lazy(Arc<Node>),
}

impl Value {
    #[must_use]
    pub fn list(items: Vec<Value>) -> Self {
        Value::List(Arc::new(RwLock::new(items)))
    }

    #[must_use]
    pub fn map(entries: BTreeMap<String, Value>) -> Self {
        Value::Map(Arc::new(RwLock::new(entries)))
    }

    #[must_use]
    pub fn native(name: &'static str, func: NativeFnPtr) -> Self {
        Value::Callable(Callable::Native(NativeFn { name, func }))
    }

    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Nil => "nil",
            Self::Boolean(_) => "boolean",
            Self::Integer(_) => "integer",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::Bytes(_) => "bytes",
            Self::List(_) => "list",
            Self::Map(_) => "map",
            Self::Callable(_) => "callable",
            Self::Module(_) => "module",
            Self::Channel(_) => "channel",
            Self::Lazy(_) => "lazy node",
        }
    }

    /// A snapshot of the elements when `self` is a list.
    #[cfg(test)]
    pub(crate) fn to_vec(&self) -> Option<Vec<Value>> {
        match self {
            Self::List(items) => Some(read(items).clone()),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        equal(self, other, &mut Vec::new())
    }
}

/// Structural equality for lists and maps, identity for handles. `open` holds
/// the collection pairs being compared further up the walk; meeting a pair
/// again means a cycle that has matched so far.
fn equal(left: &Value, right: &Value, open: &mut Vec<(usize, usize)>) -> bool {
    match (left, right) {
        (Value::Nil, Value::Nil) => true,
        (Value::Boolean(l), Value::Boolean(r)) => l == r,
        (Value::Integer(l), Value::Integer(r)) => l == r,
        (Value::Float(l), Value::Float(r)) => l == r,
        (Value::String(l), Value::String(r)) => l == r,
        (Value::Bytes(l), Value::Bytes(r)) => l == r,
        (Value::List(l), Value::List(r)) => {
            let pair = (address(l), address(r));
            if Arc::ptr_eq(l, r) || open.contains(&pair) {
                return true;
            }

            let l = read(l).clone();
            let r = read(r).clone();
            open.push(pair);
            let same = l.len() == r.len() && l.iter().zip(&r).all(|(l, r)| equal(l, r, open));
            open.pop();
            same
        }
        (Value::Map(l), Value::Map(r)) => {
            let pair = (address(l), address(r));
            if Arc::ptr_eq(l, r) || open.contains(&pair) {
                return true;
            }

            let l = read(l).clone();
            let r = read(r).clone();
            open.push(pair);
            let same = l.len() == r.len()
                && l.iter()
                    .zip(&r)
                    .all(|((lk, lv), (rk, rv))| lk == rk && equal(lv, rv, open));
            open.pop();
            same
        }
        (Value::Callable(l), Value::Callable(r)) => l == r,
        (Value::Module(l), Value::Module(r)) => Arc::ptr_eq(l, r),
        (Value::Channel(l), Value::Channel(r)) => l.ptr_eq(r),
        (Value::Lazy(l), Value::Lazy(r)) => Arc::ptr_eq(l, r),
        _ => false,
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::list(items)
    }
}

pub type NativeFnPtr = fn(&Interpreter, Vec<Value>) -> Result<Value>;

#[derive(Clone)]
pub enum Callable {
    Closure(Arc<Closure>),
    Chain(Arc<Chain>),
    Native(NativeFn),
}

impl PartialEq for Callable {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Closure(l), Self::Closure(r)) => Arc::ptr_eq(l, r),
            (Self::Chain(l), Self::Chain(r)) => Arc::ptr_eq(l, r),
            (Self::Native(l), Self::Native(r)) => l.name == r.name,
            _ => false,
        }
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self)
    }
}

/// A function literal together with the frame it was evaluated in.
pub struct Closure {
    pub(crate) func: Arc<FuncLiteral>,
    pub(crate) frame: Arc<Frame>,
}

impl Closure {
    #[must_use]
    pub fn parameters(&self) -> &[String] {
        &self.func.parameters
    }
}

/// The callable a `@chain` evaluates to. Composes on invocation.
pub struct Chain {
    pub(crate) elements: Arc<Vec<Node>>,
    pub(crate) frame: Arc<Frame>,
}

impl Chain {
    #[must_use]
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

#[derive(Clone, Copy)]
pub struct NativeFn {
    pub name: &'static str,
    pub(crate) func: NativeFnPtr,
}

/// An unbuffered rendezvous channel with an explicit closed state.
///
/// A send blocks until a receiver takes the value. Closing drops the only
/// long-lived sender, after which receivers drain anything in flight and
/// then observe the closed state. An async task that fails leaves its error
/// on the channel for the next receiver that observes the close.
#[derive(Clone)]
pub struct Channel {
    state: Arc<ChannelState>,
}

struct ChannelState {
    sender: Mutex<Option<Sender<Value>>>,
    receiver: Receiver<Value>,
    fault: Mutex<Option<ToyError>>,
}

impl Channel {
    #[must_use]
    pub fn new() -> Self {
        let (sender, receiver) = channel::bounded(0);
        Channel {
            state: Arc::new(ChannelState {
                sender: Mutex::new(Some(sender)),
                receiver,
                fault: Mutex::new(None),
            }),
        }
    }

    /// Blocks until a receiver takes `value`.
    pub fn send(&self, value: Value) -> Result<()> {
        self.sender()?
            .send(value)
            .map_err(|_| ToyError::ChannelClosed)
    }

    /// Hands `value` to a receiver that is already waiting. Returns whether
    /// one was.
    pub fn try_send(&self, value: Value) -> Result<bool> {
        match self.sender()?.try_send(value) {
            Ok(()) => Ok(true),
            Err(TrySendError::Full(_) | TrySendError::Disconnected(_)) => Ok(false),
        }
    }

    /// Blocks until a value arrives. `None` once the channel is closed and
    /// drained, or the error of the task that fed it if that task failed.
    pub fn recv(&self) -> Result<Option<Value>> {
        match self.state.receiver.recv() {
            Ok(value) => Ok(Some(value)),
            Err(_) => match lock(&self.state.fault).take() {
                Some(fault) => Err(fault),
                None => Ok(None),
            },
        }
    }

    pub fn close(&self) -> Result<()> {
        lock(&self.state.sender)
            .take()
            .map(drop)
            .ok_or(ToyError::ChannelClosed)
    }

    /// Records why the producer stopped, then closes.
    pub(crate) fn fail(&self, fault: ToyError) {
        *lock(&self.state.fault) = Some(fault);
        lock(&self.state.sender).take();
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        lock(&self.state.sender).is_none()
    }

    /// Values buffered in the channel. Always zero for a rendezvous channel.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.receiver.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn ptr_eq(&self, other: &Channel) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }

    // Clone the sender so that a blocked send doesn't hold the lock `close`
    // needs.
    fn sender(&self) -> Result<Sender<Value>> {
        lock(&self.state.sender)
            .clone()
            .ok_or(ToyError::ChannelClosed)
    }
}

impl Default for Channel {
    fn default() -> Self {
        Channel::new()
    }
}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Channel")
            .field("closed", &self.is_closed())
            .finish()
    }
}

pub(crate) fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

/// Identifies a shared collection while walking nested values.
pub(crate) fn address<T>(shared: &Arc<T>) -> usize {
    Arc::as_ptr(shared).cast::<()>() as usize
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
