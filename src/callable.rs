use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::environment::Scoping;
use crate::expr;
use crate::expr::FunctionKind;
use crate::interpreter::{Interpreter, RuntimeError};
use crate::scanner::{Token, TokenId};
use crate::value::Value;

pub static INIT: &str = "init";

/*
Arity checking is done by the interpreter before arguments are evaluated,
so `call` always receives exactly `arity()` arguments.
*/
pub trait Callable {
    fn arity(&self) -> usize;

    /// Property callables take no arguments and are invoked on access.
    fn is_property(&self) -> bool {
        false
    }

    fn call(
        self: Rc<Self>,
        interpreter: &mut Interpreter,
        call_site: &Token,
        args: &[Value],
    ) -> Result<Value, RuntimeError>;
}

pub type NativeFn = fn(&mut Interpreter, &Token, &[Value]) -> Result<Value, RuntimeError>;

#[derive(Clone)]
pub struct NativeFunction {
    pub name: String,
    pub arity: usize,
    pub is_property: bool,
    pub callable: NativeFn,
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "NativeFunction({})", self.name)
    }
}

impl Callable for NativeFunction {
    fn arity(&self) -> usize {
        self.arity
    }

    fn is_property(&self) -> bool {
        self.is_property
    }

    fn call(
        self: Rc<Self>,
        interpreter: &mut Interpreter,
        call_site: &Token,
        args: &[Value],
    ) -> Result<Value, RuntimeError> {
        (self.callable)(interpreter, call_site, args)
    }
}

/// A function, lambda or method together with the scope it was defined in.
pub struct LoxFunction {
    pub decl: Rc<expr::FunDecl>,
    pub closure: Scoping,
    /// Declaring token of `self` for methods; binding defines it.
    pub self_token: Option<Token>,
}

impl LoxFunction {
    pub fn bind(method: &Rc<LoxFunction>, instance: &Rc<LoxInstance>) -> Rc<BoundMethod> {
        let closure = match &method.self_token {
            Some(self_token) => method
                .closure
                .bind(self_token, Value::LoxInstance(Rc::clone(instance))),
            None => method.closure.clone(),
        };
        Rc::new(BoundMethod {
            method: Rc::clone(method),
            instance: Rc::clone(instance),
            closure,
        })
    }
}

impl fmt::Display for LoxFunction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.decl.kind {
            FunctionKind::Lambda => write!(f, "<lambda>"),
            _ => write!(f, "<fun {}>", self.decl.name.lexeme),
        }
    }
}

impl Callable for LoxFunction {
    fn arity(&self) -> usize {
        self.decl.params.len()
    }

    fn is_property(&self) -> bool {
        self.decl.is_property
    }

    fn call(
        self: Rc<Self>,
        interpreter: &mut Interpreter,
        call_site: &Token,
        args: &[Value],
    ) -> Result<Value, RuntimeError> {
        if self.decl.kind == FunctionKind::Method {
            return Err(RuntimeError::internal(
                call_site,
                format!("Unbound method '{}' cannot be called.", self.decl.name.lexeme),
            ));
        }
        interpreter.call_function(&self.decl, &self.closure, args)
    }
}

pub struct BoundMethod {
    pub method: Rc<LoxFunction>,
    pub instance: Rc<LoxInstance>,
    closure: Scoping,
}

impl Callable for BoundMethod {
    fn arity(&self) -> usize {
        self.method.arity()
    }

    fn is_property(&self) -> bool {
        self.method.is_property()
    }

    fn call(
        self: Rc<Self>,
        interpreter: &mut Interpreter,
        _call_site: &Token,
        args: &[Value],
    ) -> Result<Value, RuntimeError> {
        let value = interpreter.call_function(&self.method.decl, &self.closure, args)?;

        if self.method.decl.name.lexeme == INIT && value == Value::Nil {
            return Ok(Value::LoxInstance(Rc::clone(&self.instance)));
        }
        Ok(value)
    }
}

pub struct LoxClass {
    pub name: String,
    /// Id of the class name token in its declaration.
    pub decl_id: TokenId,
    pub superclasses: Vec<Rc<LoxClass>>,
    pub methods: HashMap<String, Rc<LoxFunction>>,
    pub class_methods: HashMap<String, Value>,
}

impl LoxClass {
    /// Own methods first (unless `superclass_only`), then each superclass
    /// depth-first in declaration order. The first match wins.
    pub fn find_method(&self, name: &str, superclass_only: bool) -> Option<Rc<LoxFunction>> {
        if !superclass_only {
            if let Some(method) = self.methods.get(name) {
                return Some(Rc::clone(method));
            }
        }
        self.superclasses
            .iter()
            .find_map(|superclass| superclass.find_method(name, false))
    }

    pub fn find_class_method(&self, name: &str) -> Option<Value> {
        if let Some(method) = self.class_methods.get(name) {
            return Some(method.clone());
        }
        self.superclasses
            .iter()
            .find_map(|superclass| superclass.find_class_method(name))
    }

    /// The class declared by `decl_id` within the hierarchy rooted at `class`.
    pub fn find_class(class: &Rc<LoxClass>, decl_id: TokenId) -> Option<Rc<LoxClass>> {
        if class.decl_id == decl_id {
            return Some(Rc::clone(class));
        }
        class
            .superclasses
            .iter()
            .find_map(|superclass| LoxClass::find_class(superclass, decl_id))
    }
}

impl Callable for LoxClass {
    fn arity(&self) -> usize {
        match self.find_method(INIT, false) {
            Some(initializer) => initializer.arity(),
            None => 0,
        }
    }

    fn call(
        self: Rc<Self>,
        interpreter: &mut Interpreter,
        call_site: &Token,
        args: &[Value],
    ) -> Result<Value, RuntimeError> {
        let instance = Rc::new(LoxInstance {
            class: Rc::clone(&self),
            fields: RefCell::new(HashMap::new()),
        });

        if let Some(initializer) = self.find_method(INIT, false) {
            LoxFunction::bind(&initializer, &instance).call(interpreter, call_site, args)?;
        }

        Ok(Value::LoxInstance(instance))
    }
}

pub struct LoxInstance {
    pub class: Rc<LoxClass>,
    fields: RefCell<HashMap<String, Value>>,
}

impl LoxInstance {
    /// Fields shadow methods; methods come back bound to the instance.
    pub fn get(instance: &Rc<LoxInstance>, name: &Token) -> Result<Value, RuntimeError> {
        if let Some(value) = instance.fields.borrow().get(&name.lexeme) {
            return Ok(value.clone());
        }

        match instance.class.find_method(&name.lexeme, false) {
            Some(method) => Ok(Value::BoundMethod(LoxFunction::bind(&method, instance))),
            None => Err(RuntimeError::new(
                name,
                format!("Undefined property '{}'.", name.lexeme),
            )),
        }
    }

    pub fn set(&self, name: &Token, value: Value) {
        self.fields.borrow_mut().insert(name.lexeme.clone(), value);
    }

    /// Resolves `super.m` (searching above the class `target`) or
    /// `super(B).m` (searching `B` itself, `explicit`).
    pub fn get_super(
        instance: &Rc<LoxInstance>,
        method_name: &Token,
        target: TokenId,
        explicit: bool,
    ) -> Result<Value, RuntimeError> {
        let target_class = match LoxClass::find_class(&instance.class, target) {
            Some(class) => class,
            None => {
                return Err(RuntimeError::internal(
                    method_name,
                    format!(
                        "Class of '{}' is not reachable from {} instance.",
                        method_name.lexeme, instance.class.name
                    ),
                ))
            }
        };

        match target_class.find_method(&method_name.lexeme, !explicit) {
            Some(method) => Ok(Value::BoundMethod(LoxFunction::bind(&method, instance))),
            None if explicit => Err(RuntimeError::new(
                method_name,
                format!(
                    "Superclass '{}' has no available method '{}'.",
                    target_class.name, method_name.lexeme
                ),
            )),
            None => Err(RuntimeError::new(
                method_name,
                format!(
                    "Class '{}' has no superclasses accepting method '{}'.",
                    target_class.name, method_name.lexeme
                ),
            )),
        }
    }
}
