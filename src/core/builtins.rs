use std::cmp::Ordering;
use std::collections::BTreeMap;

use super::value::{read, write, NativeFnPtr};
use super::{Callable, Channel, Frame, Interpreter, Result, ToyError, Value};

/// The builtin runtime library, bound in the root frame of every
/// interpreter.
const BUILTINS: &[(&str, NativeFnPtr)] = &[
    ("@map", map),
    ("@get", get),
    ("@set", set),
    ("@has", has),
    ("@len", len),
    ("@close", close),
    ("@await", await_value),
    ("@collect", collect),
    // aliases
    ("@push", set),
    ("@pull", get),
    // operators
    ("=", equal),
    ("+", add),
    ("-", subtract),
    ("*", multiply),
    ("/", divide),
    ("<", less),
    (">", greater),
    ("!", not),
];

pub(crate) fn inject(frame: &Frame) {
    for (name, func) in BUILTINS {
        frame.define(*name, Value::native(*name, *func));
    }
}

/// `(@map fn collection)`
fn map(interpreter: &Interpreter, args: Vec<Value>) -> Result<Value> {
    let func = callable("@map", &args, 0)?;
    match argument("@map", &args, 1)? {
        Value::List(items) => {
            // Snapshot first so `func` is free to write to the list.
            let items = read(items).clone();
            let mapped = items
                .into_iter()
                .map(|item| interpreter.call(&func, vec![item]))
                .collect::<Result<Vec<_>>>()?;
            Ok(Value::list(mapped))
        }
        Value::Map(entries) => {
            let entries = read(entries).clone();
            let mapped = entries
                .into_iter()
                .map(|(key, value)| -> Result<(String, Value)> {
                    Ok((key, interpreter.call(&func, vec![value])?))
                })
                .collect::<Result<BTreeMap<_, _>>>()?;
            Ok(Value::map(mapped))
        }
        Value::Channel(source) => {
            // No task of its own: each result is handed over before the next
            // value is received.
            let results = Channel::new();
            while let Some(item) = source.recv()? {
                results.send(interpreter.call(&func, vec![item])?)?;
            }
            results.close()?;
            Ok(Value::Channel(results))
        }
        other => Err(wrong_kind("@map", "a list, map or channel", other)),
    }
}

/// `(@get list index)`, `(@get map key)` or `(@get channel)`
fn get(_: &Interpreter, args: Vec<Value>) -> Result<Value> {
    match argument("@get", &args, 0)? {
        Value::List(items) => {
            let index = integer("@get", &args, 1)?;
            let items = read(items);
            usize::try_from(index)
                .ok()
                .and_then(|i| items.get(i))
                .cloned()
                .ok_or(ToyError::IndexOutOfBounds(index, items.len()))
        }
        Value::Map(entries) => {
            let key = string("@get", &args, 1)?;
            Ok(read(entries).get(key).cloned().unwrap_or(Value::Nil))
        }
        Value::Channel(channel) => Ok(channel.recv()?.unwrap_or(Value::Nil)),
        other => Err(wrong_kind("@get", "a list, map or channel", other)),
    }
}

/// `(@set list index value)`, `(@set list value)`, `(@set map key value)` or
/// `(@set channel value)`. Lists and maps are written in place.
fn set(_: &Interpreter, args: Vec<Value>) -> Result<Value> {
    match argument("@set", &args, 0)? {
        Value::List(items) => match (args.get(1), args.get(2)) {
            (Some(Value::Integer(index)), Some(value)) => {
                let mut items = write(items);
                let len = items.len();
                let slot = usize::try_from(*index)
                    .ok()
                    .and_then(|i| items.get_mut(i))
                    .ok_or(ToyError::IndexOutOfBounds(*index, len))?;
                *slot = value.clone();
            }
            _ => {
                let value = argument("@set", &args, 1)?.clone();
                write(items).push(value);
            }
        },
        Value::Map(entries) => {
            let key = string("@set", &args, 1)?.to_owned();
            let value = argument("@set", &args, 2)?.clone();
            write(entries).insert(key, value);
        }
        Value::Channel(channel) => {
            let value = argument("@set", &args, 1)?.clone();
            if !channel.try_send(value)? {
                tracing::warn!("dropped a value sent to a channel with no waiting receiver");
            }
        }
        other => return Err(wrong_kind("@set", "a list, map or channel", other)),
    }

    Ok(Value::Nil)
}

/// `(@has collection query)`. On a channel this receives, and so consumes,
/// values until it finds `query` or the channel closes.
fn has(_: &Interpreter, args: Vec<Value>) -> Result<Value> {
    let query = argument("@has", &args, 1)?;
    let found = match argument("@has", &args, 0)? {
        Value::List(items) => read(items).contains(query),
        Value::Map(entries) => {
            let key = string("@has", &args, 1)?;
            read(entries).contains_key(key)
        }
        Value::Channel(channel) => loop {
            match channel.recv()? {
                Some(value) if value == *query => break true,
                Some(_) => {}
                None => break false,
            }
        },
        other => return Err(wrong_kind("@has", "a list, map or channel", other)),
    };

    Ok(Value::Boolean(found))
}

fn len(_: &Interpreter, args: Vec<Value>) -> Result<Value> {
    let len = match argument("@len", &args, 0)? {
        Value::String(s) => s.chars().count(),
        Value::List(items) => read(items).len(),
        Value::Map(entries) => read(entries).len(),
        Value::Channel(channel) => channel.len(),
        other => {
            return Err(wrong_kind(
                "@len",
                "a string, list, map or channel",
                other,
            ))
        }
    };

    Ok(Value::Integer(i64::try_from(len).unwrap_or(i64::MAX)))
}

fn close(_: &Interpreter, args: Vec<Value>) -> Result<Value> {
    channel("@close", &args, 0)?.close()?;
    Ok(Value::Nil)
}

/// One blocking receive. `nil` once the channel is closed.
fn await_value(_: &Interpreter, args: Vec<Value>) -> Result<Value> {
    Ok(channel("@await", &args, 0)?.recv()?.unwrap_or(Value::Nil))
}

/// Drains a channel into a list, or lists the values of a map. Anything else
/// collects the arguments themselves.
fn collect(_: &Interpreter, args: Vec<Value>) -> Result<Value> {
    match args.first() {
        Some(Value::Channel(channel)) => {
            let mut received = Vec::new();
            while let Some(value) = channel.recv()? {
                received.push(value);
            }
            Ok(Value::list(received))
        }
        Some(Value::Map(entries)) => Ok(Value::list(read(entries).values().cloned().collect())),
        _ => Ok(Value::list(args)),
    }
}

fn equal(_: &Interpreter, args: Vec<Value>) -> Result<Value> {
    Ok(Value::Boolean(args.windows(2).all(|pair| pair[0] == pair[1])))
}

// OPERATORS

#[derive(Clone, Copy, Debug)]
enum Number {
    Integer(i64),
    Float(f64),
}

impl Number {
    #[allow(clippy::cast_precision_loss)]
    fn to_f64(self) -> f64 {
        match self {
            Number::Integer(n) => n as f64,
            Number::Float(n) => n,
        }
    }

    fn compare(self, other: Number) -> Option<Ordering> {
        match (self, other) {
            (Number::Integer(l), Number::Integer(r)) => Some(l.cmp(&r)),
            (l, r) => l.to_f64().partial_cmp(&r.to_f64()),
        }
    }
}

impl From<Number> for Value {
    fn from(n: Number) -> Self {
        match n {
            Number::Integer(n) => Value::Integer(n),
            Number::Float(n) => Value::Float(n),
        }
    }
}

fn number(operator: &'static str, value: &Value) -> Result<Number> {
    match value {
        Value::Integer(n) => Ok(Number::Integer(*n)),
        Value::Float(n) => Ok(Number::Float(*n)),
        other => Err(wrong_kind(operator, "a number", other)),
    }
}

/// Folds `args` left to right. Integers stay integers until a float shows
/// up.
fn arithmetic(
    operator: &'static str,
    args: &[Value],
    checked: fn(i64, i64) -> Option<i64>,
    float: fn(f64, f64) -> f64,
) -> Result<Value> {
    let mut operands = args.iter().map(|arg| number(operator, arg));
    let first = operands
        .next()
        .ok_or_else(|| ToyError::MissingArgument(operator.to_owned(), 0))??;

    let result = operands.try_fold(first, |acc, operand| -> Result<Number> {
        Ok(match (acc, operand?) {
            (Number::Integer(l), Number::Integer(r)) => {
                Number::Integer(checked(l, r).ok_or(ToyError::Overflow(operator))?)
            }
            (l, r) => Number::Float(float(l.to_f64(), r.to_f64())),
        })
    })?;

    Ok(result.into())
}

/// Sums numbers, or concatenates when the first argument is a string.
fn add(_: &Interpreter, args: Vec<Value>) -> Result<Value> {
    match args.first() {
        None => Ok(Value::Integer(0)),
        Some(Value::String(_)) => Ok(Value::String(
            args.iter().map(ToString::to_string).collect(),
        )),
        Some(_) => arithmetic("+", &args, i64::checked_add, |l, r| l + r),
    }
}

/// Negates a single argument, otherwise subtracts the rest from the first.
fn subtract(_: &Interpreter, args: Vec<Value>) -> Result<Value> {
    if let [only] = args.as_slice() {
        return match number("-", only)? {
            Number::Integer(n) => n
                .checked_neg()
                .map(Value::Integer)
                .ok_or(ToyError::Overflow("-")),
            Number::Float(n) => Ok(Value::Float(-n)),
        };
    }

    arithmetic("-", &args, i64::checked_sub, |l, r| l - r)
}

fn multiply(_: &Interpreter, args: Vec<Value>) -> Result<Value> {
    arithmetic("*", &args, i64::checked_mul, |l, r| l * r)
}

/// Integer division truncates. Dividing an integer by zero is an error.
fn divide(_: &Interpreter, args: Vec<Value>) -> Result<Value> {
    if args
        .iter()
        .skip(1)
        .any(|arg| matches!(arg, Value::Integer(0)))
    {
        return Err(ToyError::DivisionByZero);
    }

    arithmetic("/", &args, i64::checked_div, |l, r| l / r)
}

fn less(_: &Interpreter, args: Vec<Value>) -> Result<Value> {
    ordered("<", &args, Ordering::Less)
}

fn greater(_: &Interpreter, args: Vec<Value>) -> Result<Value> {
    ordered(">", &args, Ordering::Greater)
}

/// Whether every adjacent pair of `args` compares as `expected`.
fn ordered(operator: &'static str, args: &[Value], expected: Ordering) -> Result<Value> {
    if args.len() < 2 {
        return Err(ToyError::MissingArgument(operator.to_owned(), args.len()));
    }

    for pair in args.windows(2) {
        let ordering = match (&pair[0], &pair[1]) {
            (Value::String(l), Value::String(r)) => Some(l.cmp(r)),
            (l, r) => number(operator, l)?.compare(number(operator, r)?),
        };

        if ordering != Some(expected) {
            return Ok(Value::Boolean(false));
        }
    }

    Ok(Value::Boolean(true))
}

fn not(_: &Interpreter, args: Vec<Value>) -> Result<Value> {
    match argument("!", &args, 0)? {
        Value::Boolean(b) => Ok(Value::Boolean(!b)),
        other => Err(wrong_kind("!", "a boolean", other)),
    }
}

// ARGUMENT HELPERS

pub(crate) fn argument<'a>(builtin: &str, args: &'a [Value], position: usize) -> Result<&'a Value> {
    args.get(position)
        .ok_or_else(|| ToyError::MissingArgument(builtin.to_owned(), position))
}

pub(crate) fn wrong_kind(builtin: &str, expected: &'static str, actual: &Value) -> ToyError {
    ToyError::WrongKind {
        builtin: builtin.to_owned(),
        expected,
        actual: actual.kind_name(),
    }
}

pub(crate) fn string<'a>(builtin: &str, args: &'a [Value], position: usize) -> Result<&'a str> {
    match argument(builtin, args, position)? {
        Value::String(s) => Ok(s),
        other => Err(wrong_kind(builtin, "a string", other)),
    }
}

fn integer(builtin: &str, args: &[Value], position: usize) -> Result<i64> {
    match argument(builtin, args, position)? {
        Value::Integer(n) => Ok(*n),
        other => Err(wrong_kind(builtin, "an integer", other)),
    }
}

fn channel<'a>(builtin: &str, args: &'a [Value], position: usize) -> Result<&'a Channel> {
    match argument(builtin, args, position)? {
        Value::Channel(channel) => Ok(channel),
        other => Err(wrong_kind(builtin, "a channel", other)),
    }
}

fn callable(builtin: &str, args: &[Value], position: usize) -> Result<Callable> {
    match argument(builtin, args, position)? {
        Value::Callable(callable) => Ok(callable.clone()),
        other => Err(wrong_kind(builtin, "a callable", other)),
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    fn strings(items: &[&str]) -> Value {
        Value::list(items.iter().map(|s| Value::from(*s)).collect())
    }

    fn ints(items: &[i64]) -> Value {
        Value::list(items.iter().map(|n| Value::Integer(*n)).collect())
    }

    #[test]
    fn it_injects_every_builtin_into_the_frame() {
        let frame = Frame::default();
        inject(&frame);

        for name in [
            "@map", "@get", "@set", "@has", "@len", "@close", "@await", "@collect", "@push",
            "@pull", "=",
        ] {
            assert!(frame.contains_local(name), "{} is missing", name);
        }
        assert_eq!(
            Some(Value::native("@push", set)),
            frame.get_local("@push")
        );
    }

    #[test]
    fn it_maps_over_lists_and_maps() {
        let interpreter = Interpreter::new();
        let measure = Value::native("@len", len);

        assert_eq!(
            Ok(ints(&[1, 3])),
            map(&interpreter, vec![measure.clone(), strings(&["a", "abc"])])
        );

        let entries = vec![("k".to_owned(), Value::from("four"))].into_iter().collect();
        let mapped = map(&interpreter, vec![measure, Value::map(entries)]);
        assert_eq!(
            Ok(Value::map(
                vec![("k".to_owned(), Value::Integer(4))].into_iter().collect()
            )),
            mapped
        );
    }

    #[test]
    fn it_maps_an_exhausted_channel_to_a_closed_channel() {
        let interpreter = Interpreter::new();
        let source = Channel::new();
        source.close().unwrap();

        let mapped = map(
            &interpreter,
            vec![Value::native("@len", len), Value::Channel(source)],
        )
        .unwrap();
        match mapped {
            Value::Channel(results) => assert!(results.is_closed()),
            other => panic!("expected a channel, got {}", other),
        }
    }

    #[test]
    fn it_gets_by_index_and_key() {
        let interpreter = Interpreter::new();
        let list = ints(&[10, 20]);

        assert_eq!(
            Ok(Value::Integer(20)),
            get(&interpreter, vec![list.clone(), Value::Integer(1)])
        );
        assert_eq!(
            Err(ToyError::IndexOutOfBounds(2, 2)),
            get(&interpreter, vec![list.clone(), Value::Integer(2)])
        );
        assert_eq!(
            Err(ToyError::IndexOutOfBounds(-1, 2)),
            get(&interpreter, vec![list, Value::Integer(-1)])
        );

        let map = Value::map(BTreeMap::new());
        assert_eq!(Ok(Value::Nil), get(&interpreter, vec![map, Value::from("nope")]));
    }

    #[test]
    fn it_writes_lists_and_maps_in_place() {
        let interpreter = Interpreter::new();
        let list = ints(&[1, 2]);

        set(&interpreter, vec![list.clone(), Value::Integer(0), Value::Integer(9)]).unwrap();
        set(&interpreter, vec![list.clone(), Value::from("tail")]).unwrap();
        assert_eq!(
            Some(vec![Value::Integer(9), Value::Integer(2), Value::from("tail")]),
            list.to_vec()
        );

        let map = Value::map(BTreeMap::new());
        set(&interpreter, vec![map.clone(), Value::from("k"), Value::Integer(1)]).unwrap();
        assert_eq!(Ok(Value::Boolean(true)), has(&interpreter, vec![map, Value::from("k")]));
    }

    #[test]
    fn it_reports_the_missing_argument_position() {
        let interpreter = Interpreter::new();
        let map = Value::map(BTreeMap::new());

        assert_eq!(
            Err(ToyError::MissingArgument("@set".to_owned(), 2)),
            set(&interpreter, vec![map, Value::from("k")])
        );
    }

    #[test]
    fn it_rejects_values_of_the_wrong_kind() {
        let interpreter = Interpreter::new();

        assert_eq!(
            Err(ToyError::WrongKind {
                builtin: "@len".to_owned(),
                expected: "a string, list, map or channel",
                actual: "integer",
            }),
            len(&interpreter, vec![Value::Integer(3)])
        );
    }

    #[test]
    fn it_drops_a_push_to_a_channel_nobody_is_receiving_on() {
        let interpreter = Interpreter::new();
        let channel = Channel::new();

        assert_eq!(
            Ok(Value::Nil),
            set(&interpreter, vec![Value::Channel(channel.clone()), Value::Integer(1)])
        );
        channel.close().unwrap();
        assert_eq!(
            Err(ToyError::ChannelClosed),
            set(&interpreter, vec![Value::Channel(channel), Value::Integer(1)])
        );
    }

    #[test]
    fn it_collects_and_searches_channels() {
        let interpreter = Interpreter::new();
        let channel = Channel::new();
        let producer = channel.clone();
        let handle = thread::spawn(move || {
            for n in 1..=4 {
                producer.send(Value::Integer(n)).unwrap();
            }
            producer.close().unwrap();
        });

        let found = has(&interpreter, vec![Value::Channel(channel.clone()), Value::Integer(2)]);
        let rest = collect(&interpreter, vec![Value::Channel(channel.clone())]);
        handle.join().unwrap();

        assert_eq!(Ok(Value::Boolean(true)), found);
        assert_eq!(Ok(ints(&[3, 4])), rest);
        assert_eq!(
            Ok(Value::Nil),
            await_value(&interpreter, vec![Value::Channel(channel.clone())])
        );
        assert_eq!(
            Err(ToyError::ChannelClosed),
            close(&interpreter, vec![Value::Channel(channel)])
        );
    }

    #[test]
    fn it_collects_map_values_and_plain_arguments() {
        let interpreter = Interpreter::new();
        let entries = vec![
            ("a".to_owned(), Value::Integer(1)),
            ("b".to_owned(), Value::Integer(2)),
        ];
        let map = Value::map(entries.into_iter().collect());

        assert_eq!(Ok(ints(&[1, 2])), collect(&interpreter, vec![map]));
        assert_eq!(
            Ok(ints(&[7, 8])),
            collect(&interpreter, vec![Value::Integer(7), Value::Integer(8)])
        );
    }

    #[test]
    fn it_compares_all_arguments_for_equality() {
        let interpreter = Interpreter::new();

        assert_eq!(
            Ok(Value::Boolean(true)),
            equal(&interpreter, vec![Value::Integer(1), Value::Integer(1), Value::Integer(1)])
        );
        assert_eq!(
            Ok(Value::Boolean(false)),
            equal(&interpreter, vec![Value::Integer(1), Value::from("1")])
        );
        assert_eq!(
            Ok(Value::Boolean(true)),
            equal(&interpreter, vec![ints(&[1]), ints(&[1])])
        );
    }

    #[test]
    fn it_does_integer_and_float_arithmetic() {
        let interpreter = Interpreter::new();

        assert_eq!(
            Ok(Value::Integer(6)),
            add(&interpreter, vec![Value::Integer(1), Value::Integer(2), Value::Integer(3)])
        );
        assert_eq!(
            Ok(Value::Float(3.5)),
            add(&interpreter, vec![Value::Integer(1), Value::Float(2.5)])
        );
        assert_eq!(
            Ok(Value::from("ab1")),
            add(&interpreter, vec![Value::from("a"), Value::from("b"), Value::Integer(1)])
        );
        assert_eq!(Ok(Value::Integer(-4)), subtract(&interpreter, vec![Value::Integer(4)]));
        assert_eq!(
            Ok(Value::Integer(3)),
            divide(&interpreter, vec![Value::Integer(7), Value::Integer(2)])
        );
        assert_eq!(
            Err(ToyError::DivisionByZero),
            divide(&interpreter, vec![Value::Integer(7), Value::Integer(0)])
        );
        assert_eq!(
            Err(ToyError::Overflow("*")),
            multiply(&interpreter, vec![Value::Integer(i64::MAX), Value::Integer(2)])
        );
    }

    #[test]
    fn it_orders_numbers_and_strings() {
        let interpreter = Interpreter::new();

        assert_eq!(
            Ok(Value::Boolean(true)),
            less(&interpreter, vec![Value::Integer(1), Value::Float(1.5), Value::Integer(2)])
        );
        assert_eq!(
            Ok(Value::Boolean(false)),
            greater(&interpreter, vec![Value::Integer(2), Value::Integer(2)])
        );
        assert_eq!(
            Ok(Value::Boolean(true)),
            greater(&interpreter, vec![Value::from("b"), Value::from("a")])
        );
        assert_eq!(
            Err(ToyError::MissingArgument("<".to_owned(), 1)),
            less(&interpreter, vec![Value::Integer(1)])
        );
        assert_eq!(Ok(Value::Boolean(false)), not(&interpreter, vec![Value::Boolean(true)]));
    }
}
