use std::fmt;
use std::rc::Rc;

use crate::callable::{BoundMethod, Callable, LoxClass, LoxFunction, LoxInstance, NativeFunction};

#[derive(Clone)]
pub enum Value {
    Number(f64),
    Bool(bool),
    String(String),
    Nil,
    NativeFunction(Rc<NativeFunction>),
    LoxFunction(Rc<LoxFunction>),
    BoundMethod(Rc<BoundMethod>),
    LoxClass(Rc<LoxClass>),
    LoxInstance(Rc<LoxInstance>),
    /// Slot of a variable declared without initializer. Reading it is an
    /// error, so it never reaches a program.
    Uninitialized,
}

pub fn as_callable(value: &Value) -> Option<Rc<dyn Callable>> {
    match value {
        Value::NativeFunction(f) => Some(Rc::clone(f) as Rc<dyn Callable>),
        Value::LoxFunction(f) => Some(Rc::clone(f) as Rc<dyn Callable>),
        Value::BoundMethod(m) => Some(Rc::clone(m) as Rc<dyn Callable>),
        Value::LoxClass(c) => Some(Rc::clone(c) as Rc<dyn Callable>),
        _ => None,
    }
}

impl Value {
    /// false and nil are falsey, and so are 0 and the empty string.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0,
            Value::String(s) => !s.is_empty(),
            Value::Nil => false,
            _ => true,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Number(n1), Value::Number(n2)) => n1 == n2,
            (Value::Bool(b1), Value::Bool(b2)) => b1 == b2,
            (Value::String(s1), Value::String(s2)) => s1 == s2,
            (Value::Nil, Value::Nil) => true,
            (Value::NativeFunction(f1), Value::NativeFunction(f2)) => Rc::ptr_eq(f1, f2),
            (Value::LoxFunction(f1), Value::LoxFunction(f2)) => Rc::ptr_eq(f1, f2),
            (Value::BoundMethod(m1), Value::BoundMethod(m2)) => Rc::ptr_eq(m1, m2),
            (Value::LoxClass(c1), Value::LoxClass(c2)) => Rc::ptr_eq(c1, c2),
            (Value::LoxInstance(i1), Value::LoxInstance(i2)) => Rc::ptr_eq(i1, i2),
            (_, _) => false,
        }
    }
}

/// Whole values print without a fraction. Magnitudes from 1e21 up, or
/// below 1e-7, use exponent form: `1.0E21`, `2.5E-8`.
pub fn format_number(num: f64) -> String {
    if num.is_nan() {
        return "NaN".to_string();
    }
    if num.is_infinite() {
        return if num > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }

    let magnitude = num.abs();
    if magnitude < 1e21 && (magnitude >= 1e-7 || num == 0.0) {
        // f64's Display already drops the fraction of whole values
        return num.to_string();
    }

    let formatted = format!("{:e}", num);
    match formatted.split_once('e') {
        Some((mantissa, exponent)) if mantissa.contains('.') => format!("{}E{}", mantissa, exponent),
        Some((mantissa, exponent)) => format!("{}.0E{}", mantissa, exponent),
        None => formatted,
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Number(num) => write!(f, "{}", format_number(*num)),
            Value::Bool(b) => write!(f, "{}", b),
            Value::String(s) => write!(f, "{}", s),
            Value::Nil => write!(f, "nil"),
            Value::NativeFunction(func) => write!(f, "<native fun: {}>", func.name),
            Value::LoxFunction(func) => write!(f, "{}", func),
            Value::BoundMethod(method) => write!(f, "{}", method.method),
            Value::LoxClass(class) => write!(f, "<class {}>", class.name),
            Value::LoxInstance(instance) => write!(f, "{} instance", instance.class.name),
            Value::Uninitialized => write!(f, "<uninitialized>"),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "{:?}", s),
            _ => write!(f, "{}", self),
        }
    }
}
