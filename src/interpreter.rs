use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::analyzer::Resolutions;
use crate::builtins;
use crate::callable::{Callable, LoxClass, LoxFunction, LoxInstance, NativeFn, NativeFunction};
use crate::diagnostics::Diagnostics;
use crate::environment::{Environment, Scoping, SymbolKind};
use crate::expr;
use crate::expr::{BinaryOpTy, Expr, FunBody, Stmt, UnaryOpTy};
use crate::scanner::{Token, TokenType};
use crate::value;
use crate::value::Value;

/// Nested calls allowed before a program is stopped with "Stack overflow.".
pub const MAX_CALL_DEPTH: usize = 200;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ErrorKind {
    Runtime,
    /// A state the analyzer should have ruled out.
    Internal,
    /// Raised by the `exit` native; not an error for the program.
    Exit(i32),
}

#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct RuntimeError {
    pub token: Token,
    pub kind: ErrorKind,
    pub message: String,
}

impl RuntimeError {
    pub fn new(token: &Token, message: impl Into<String>) -> RuntimeError {
        RuntimeError {
            token: token.clone(),
            kind: ErrorKind::Runtime,
            message: message.into(),
        }
    }

    pub fn internal(token: &Token, message: impl Into<String>) -> RuntimeError {
        RuntimeError {
            token: token.clone(),
            kind: ErrorKind::Internal,
            message: message.into(),
        }
    }

    pub fn exit(token: &Token, code: i32) -> RuntimeError {
        RuntimeError {
            token: token.clone(),
            kind: ErrorKind::Exit(code),
            message: format!("exit({})", code),
        }
    }
}

/// Receives each printed line while the program runs.
pub type OutputSink = Box<dyn FnMut(&str)>;

/// How a statement finished. Anything but `Normal` unwinds to the nearest
/// loop or call that handles it.
#[derive(Debug)]
enum Flow {
    Normal,
    Break(Token),
    Continue(Token),
    Return(Value),
}

pub struct Interpreter {
    env: Environment,
    resolutions: Resolutions,
    pub output: Vec<String>,
    sink: Option<OutputSink>,
    pub interrupted: Arc<AtomicBool>,
    depth: usize,
}

impl Default for Interpreter {
    fn default() -> Interpreter {
        let mut interpreter = Interpreter {
            env: Environment::default(),
            resolutions: Resolutions::default(),
            output: Vec::new(),
            sink: None,
            interrupted: Arc::new(AtomicBool::new(false)),
            depth: 0,
        };
        builtins::define_all(&mut interpreter);
        interpreter
    }
}

impl Interpreter {
    /// Runs `stmts` on top of whatever earlier runs defined. The first
    /// runtime error stops the program and is reported; `exit(n)` stops it
    /// silently with `ErrorKind::Exit(n)`.
    pub fn interpret(
        &mut self,
        stmts: &[Stmt],
        resolutions: Resolutions,
        diagnostics: &mut Diagnostics,
    ) -> Result<(), ErrorKind> {
        let _span = tracing::debug_span!("interpret", stmts = stmts.len()).entered();

        self.interrupted.store(false, Ordering::Release);
        self.resolutions.extend(resolutions);
        self.depth = 0;

        let mut res = Ok(());
        for stmt in stmts {
            let outcome = match self.execute(stmt) {
                Ok(Flow::Normal) => Ok(()),
                Ok(Flow::Break(token)) | Ok(Flow::Continue(token)) => Err(RuntimeError::internal(
                    &token,
                    format!("'{}' reached the top level.", token.lexeme),
                )),
                Ok(Flow::Return(_)) => Ok(()),
                Err(err) => Err(err),
            };

            if let Err(err) = outcome {
                match err.kind {
                    ErrorKind::Exit(code) => tracing::debug!(code, "program exited"),
                    ErrorKind::Internal => diagnostics
                        .error_at_token(&err.token, &format!("Internal error: {}", err.message)),
                    ErrorKind::Runtime => diagnostics.error_at_token(&err.token, &err.message),
                }
                res = Err(err.kind);
                break;
            }
        }

        for line in self.output.drain(..) {
            diagnostics.print(line);
        }
        res
    }

    /// Forgets every user definition and binding; natives stay.
    pub fn reset(&mut self) {
        self.env.reset();
        self.resolutions.clear();
        self.output.clear();
        self.depth = 0;
    }

    /// Sends printed lines to `sink` as they are produced instead of
    /// collecting them in `output`.
    pub fn set_output(&mut self, sink: OutputSink) {
        self.sink = Some(sink);
    }

    pub fn environment(&self) -> &Environment {
        &self.env
    }

    pub fn define_native(&mut self, name: &str, arity: usize, is_property: bool, callable: NativeFn) {
        let native = NativeFunction {
            name: name.to_string(),
            arity,
            is_property,
            callable,
        };
        self.define_global(&Token::special(name), Value::NativeFunction(Rc::new(native)));
    }

    /// Binds `value` to `name` in the native scope. A class should carry
    /// `name.id` as its `decl_id` so explicit super dispatch can find it.
    pub fn define_global(&mut self, name: &Token, value: Value) {
        let kind = match value {
            Value::LoxClass(_) => SymbolKind::Class,
            Value::NativeFunction(_) | Value::LoxFunction(_) | Value::BoundMethod(_) => {
                SymbolKind::Fun
            }
            _ => SymbolKind::Var,
        };
        self.env.define_native(name, kind, value);
    }

    /// Runs a function body in a fresh scope over `closure`, with the
    /// parameters bound to `args`.
    pub fn call_function(
        &mut self,
        decl: &expr::FunDecl,
        closure: &Scoping,
        args: &[Value],
    ) -> Result<Value, RuntimeError> {
        if self.depth >= MAX_CALL_DEPTH {
            return Err(RuntimeError::new(&decl.name, "Stack overflow."));
        }
        self.check_interrupt(&decl.name)?;
        tracing::trace!(function = %decl.name.lexeme, depth = self.depth, "call");

        self.depth += 1;
        let res = self.with_swapped(closure, |interpreter| {
            for (param, arg) in decl.params.iter().zip(args.iter()) {
                interpreter
                    .env
                    .define_symbol(param, SymbolKind::Param, arg.clone(), false)?;
            }

            match &decl.body {
                // the body block shares the parameter scope
                FunBody::Block(stmts) => match interpreter.execute_all(stmts)? {
                    Flow::Normal => Ok(Value::Nil),
                    Flow::Return(value) => Ok(value),
                    Flow::Break(token) | Flow::Continue(token) => Err(RuntimeError::internal(
                        &token,
                        format!("'{}' escaped its function.", token.lexeme),
                    )),
                },
                FunBody::Expr(expr) => interpreter.evaluate(expr),
            }
        });
        self.depth -= 1;
        res
    }

    fn with_swapped<T>(
        &mut self,
        scoping: &Scoping,
        f: impl FnOnce(&mut Interpreter) -> Result<T, RuntimeError>,
    ) -> Result<T, RuntimeError> {
        self.env.swap(scoping);
        let res = f(self);
        self.env.unswap();
        res
    }

    fn with_scope<T>(
        &mut self,
        f: impl FnOnce(&mut Interpreter) -> Result<T, RuntimeError>,
    ) -> Result<T, RuntimeError> {
        self.env.push(false);
        let res = f(self);
        self.env.pop();
        res
    }

    fn check_interrupt(&self, token: &Token) -> Result<(), RuntimeError> {
        if self.interrupted.load(Ordering::Acquire) {
            return Err(RuntimeError::new(token, "Interrupted."));
        }
        Ok(())
    }

    fn execute_all(&mut self, stmts: &[Stmt]) -> Result<Flow, RuntimeError> {
        for stmt in stmts {
            match self.execute(stmt)? {
                Flow::Normal => {}
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    fn execute(&mut self, stmt: &Stmt) -> Result<Flow, RuntimeError> {
        match stmt {
            Stmt::Expr(expr) => {
                self.evaluate(expr)?;
            }
            Stmt::Print(expr) | Stmt::Last(expr) => {
                let text = self.evaluate(expr)?.to_string();
                match self.sink.as_mut() {
                    Some(sink) => sink(&text),
                    None => self.output.push(text),
                }
            }
            Stmt::VarDecl(name, maybe_init) => {
                let value = match maybe_init {
                    Some(init) => self.evaluate(init)?,
                    None => Value::Uninitialized,
                };
                self.env.define_symbol(name, SymbolKind::Var, value, false)?;
            }
            Stmt::FunDecl(decl) => {
                let function = LoxFunction {
                    decl: Rc::clone(decl),
                    closure: self.env.get_scoping(),
                    self_token: None,
                };
                self.env.define_symbol(
                    &decl.name,
                    SymbolKind::Fun,
                    Value::LoxFunction(Rc::new(function)),
                    false,
                )?;
            }
            Stmt::ClassDecl(decl) => self.class_decl(decl)?,
            Stmt::Block(stmts) => return self.with_scope(|interpreter| interpreter.execute_all(stmts)),
            Stmt::If(cond, then_branch, maybe_else_branch) => {
                if self.evaluate(cond)?.is_truthy() {
                    return self.execute(then_branch);
                }
                if let Some(else_branch) = maybe_else_branch {
                    return self.execute(else_branch);
                }
            }
            Stmt::While(keyword, cond, body) => loop {
                self.check_interrupt(keyword)?;
                if !self.evaluate(cond)?.is_truthy() {
                    break;
                }
                match self.execute(body)? {
                    Flow::Normal => {}
                    Flow::Break(_) => break,
                    Flow::Continue(token) => {
                        return Err(RuntimeError::internal(
                            &token,
                            "'continue' was not caught by its loop.",
                        ))
                    }
                    flow @ Flow::Return(_) => return Ok(flow),
                }
            },
            Stmt::ContinueCatcher(body) => {
                return match self.execute(body)? {
                    Flow::Continue(_) => Ok(Flow::Normal),
                    flow => Ok(flow),
                }
            }
            Stmt::ForBlock(body, updater) => {
                return match self.execute(body)? {
                    Flow::Normal | Flow::Continue(_) => self.execute(updater),
                    flow => Ok(flow),
                }
            }
            Stmt::Return(_, maybe_value) => {
                let value = match maybe_value {
                    Some(value) => self.evaluate(value)?,
                    None => Value::Nil,
                };
                return Ok(Flow::Return(value));
            }
            Stmt::Break(keyword) => return Ok(Flow::Break(keyword.clone())),
            Stmt::Continue(keyword) => return Ok(Flow::Continue(keyword.clone())),
        }
        Ok(Flow::Normal)
    }

    fn class_decl(&mut self, decl: &Rc<expr::ClassDecl>) -> Result<(), RuntimeError> {
        let mut superclasses = Vec::new();
        for superclass in decl.superclasses.iter() {
            match self.lookup(superclass)? {
                Value::LoxClass(class) => superclasses.push(class),
                _ => return Err(RuntimeError::new(superclass, "superclass: class expected.")),
            }
        }

        let closure = self.env.get_scoping();
        let methods = decl
            .methods
            .iter()
            .map(|method| {
                let function = LoxFunction {
                    decl: Rc::clone(method),
                    closure: closure.clone(),
                    self_token: Some(decl.self_token.clone()),
                };
                (method.name.lexeme.clone(), Rc::new(function))
            })
            .collect();
        let class_methods = decl
            .class_methods
            .iter()
            .map(|method| {
                let function = LoxFunction {
                    decl: Rc::clone(method),
                    closure: closure.clone(),
                    self_token: None,
                };
                (
                    method.name.lexeme.clone(),
                    Value::LoxFunction(Rc::new(function)),
                )
            })
            .collect();

        let class = LoxClass {
            name: decl.name.lexeme.clone(),
            decl_id: decl.name.id,
            superclasses,
            methods,
            class_methods,
        };
        self.env.define_symbol(
            &decl.name,
            SymbolKind::Class,
            Value::LoxClass(Rc::new(class)),
            false,
        )
    }

    fn lookup(&self, name: &Token) -> Result<Value, RuntimeError> {
        self.env.get_value(name, self.resolutions.target(name))
    }

    /// Property functions run as soon as they are read.
    fn invoke_property(&mut self, value: Value, token: &Token) -> Result<Value, RuntimeError> {
        match value::as_callable(&value) {
            Some(callable) if callable.is_property() => callable.call(self, token, &[]),
            _ => Ok(value),
        }
    }

    fn evaluate(&mut self, expr: &Expr) -> Result<Value, RuntimeError> {
        match expr {
            Expr::Literal(lit) => Ok(Interpreter::literal(lit)),
            Expr::Unary(op, operand) => {
                let value = self.evaluate(operand)?;
                match op.ty {
                    UnaryOpTy::Bang => Ok(Value::Bool(!value.is_truthy())),
                    UnaryOpTy::Minus => Ok(Value::Number(-number(
                        &value,
                        &op.token,
                        "right operand",
                    )?)),
                }
            }
            Expr::Binary(left, op, right) => self.binary(left, op, right),
            Expr::Ternary {
                condition,
                then_branch,
                else_branch,
                ..
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    self.evaluate(then_branch)
                } else {
                    self.evaluate(else_branch)
                }
            }
            Expr::Call(callee, paren, args) => self.call(callee, paren, args),
            Expr::Get(object, name) => {
                let object = self.evaluate(object)?;
                let value = match &object {
                    Value::LoxInstance(instance) => LoxInstance::get(instance, name)?,
                    Value::LoxClass(class) => match class.find_class_method(&name.lexeme) {
                        Some(method) => method,
                        None => {
                            return Err(RuntimeError::new(
                                name,
                                format!("Undefined property '{}'.", name.lexeme),
                            ))
                        }
                    },
                    _ => return Err(RuntimeError::new(name, "Only instances have properties.")),
                };
                self.invoke_property(value, name)
            }
            Expr::Set(object, name, value) => {
                let instance = match self.evaluate(object)? {
                    Value::LoxInstance(instance) => instance,
                    _ => return Err(RuntimeError::new(name, "Only instances have fields.")),
                };
                let value = self.evaluate(value)?;
                instance.set(name, value.clone());
                Ok(value)
            }
            Expr::Grouping(inner) => self.evaluate(inner),
            Expr::Variable(name) => {
                let value = self.lookup(name)?;
                self.invoke_property(value, name)
            }
            Expr::Assign(name, value) => {
                let value = self.evaluate(value)?;
                self.env
                    .assign_symbol(name, value.clone(), self.resolutions.target(name))?;
                Ok(value)
            }
            Expr::Lambda(decl) => Ok(Value::LoxFunction(Rc::new(LoxFunction {
                decl: Rc::clone(decl),
                closure: self.env.get_scoping(),
                self_token: None,
            }))),
            Expr::Super(sref) => self.super_expr(sref),
            Expr::TypeCheck(inner, operator) => match self.evaluate(inner)? {
                value @ Value::Number(_) => Ok(value),
                _ => Err(RuntimeError::new(
                    operator,
                    format!("Operand of '{}' must be a number.", operator.lexeme),
                )),
            },
        }
    }

    fn literal(lit: &expr::Literal) -> Value {
        match lit {
            expr::Literal::Number(n) => Value::Number(*n),
            expr::Literal::String(s) => Value::String(s.clone()),
            expr::Literal::True => Value::Bool(true),
            expr::Literal::False => Value::Bool(false),
            expr::Literal::Nil => Value::Nil,
        }
    }

    fn binary(&mut self, left: &Expr, op: &expr::BinaryOp, right: &Expr) -> Result<Value, RuntimeError> {
        let left = self.evaluate(left)?;

        match op.ty {
            BinaryOpTy::And => {
                if left.is_truthy() {
                    self.evaluate(right)
                } else {
                    Ok(left)
                }
            }
            BinaryOpTy::Or => {
                if left.is_truthy() {
                    Ok(left)
                } else {
                    self.evaluate(right)
                }
            }
            BinaryOpTy::Comma => self.evaluate(right),
            BinaryOpTy::EqualEqual => Ok(Value::Bool(left == self.evaluate(right)?)),
            BinaryOpTy::NotEqual => Ok(Value::Bool(left != self.evaluate(right)?)),
            BinaryOpTy::Plus => {
                let right = self.evaluate(right)?;
                match (&left, &right) {
                    (Value::Number(n1), Value::Number(n2)) => Ok(Value::Number(n1 + n2)),
                    (Value::String(_), _) | (_, Value::String(_)) => {
                        Ok(Value::String(format!("{}{}", left, right)))
                    }
                    _ => Err(RuntimeError::new(&op.token, "Operands cannot be added.")),
                }
            }
            ty => {
                // the left operand is checked before the right one runs
                let n1 = number(&left, &op.token, "left operand")?;
                let right = self.evaluate(right)?;
                let n2 = number(&right, &op.token, "right operand")?;

                match ty {
                    BinaryOpTy::Less => Ok(Value::Bool(n1 < n2)),
                    BinaryOpTy::LessEqual => Ok(Value::Bool(n1 <= n2)),
                    BinaryOpTy::Greater => Ok(Value::Bool(n1 > n2)),
                    BinaryOpTy::GreaterEqual => Ok(Value::Bool(n1 >= n2)),
                    BinaryOpTy::Minus => Ok(Value::Number(n1 - n2)),
                    BinaryOpTy::Star => Ok(Value::Number(n1 * n2)),
                    BinaryOpTy::StarStar => Ok(Value::Number(n1.powf(n2))),
                    BinaryOpTy::Slash | BinaryOpTy::Percent if n2 == 0.0 => {
                        Err(RuntimeError::new(&op.token, "Division by zero."))
                    }
                    BinaryOpTy::Slash => Ok(Value::Number(n1 / n2)),
                    BinaryOpTy::Percent => Ok(Value::Number(n1 % n2)),
                    _ => Err(RuntimeError::internal(
                        &op.token,
                        format!("Unexpected operator '{}'.", op.token.lexeme),
                    )),
                }
            }
        }
    }

    fn call(&mut self, callee: &Expr, paren: &Token, arg_exprs: &[Expr]) -> Result<Value, RuntimeError> {
        let callee = self.evaluate(callee)?;

        let callable = match value::as_callable(&callee) {
            Some(callable) => callable,
            None => {
                return Err(RuntimeError::new(
                    paren,
                    "Can only call functions and classes.",
                ))
            }
        };

        if callable.arity() != arg_exprs.len() {
            return Err(RuntimeError::new(
                paren,
                format!(
                    "Expected {} arguments but got {}.",
                    callable.arity(),
                    arg_exprs.len()
                ),
            ));
        }

        let args = arg_exprs
            .iter()
            .map(|arg| self.evaluate(arg))
            .collect::<Result<Vec<_>, _>>()?;

        callable.call(self, paren, &args)
    }

    fn super_expr(&mut self, sref: &expr::SuperRef) -> Result<Value, RuntimeError> {
        let self_token = Token::new(
            TokenType::SelfKw,
            "self",
            None,
            sref.keyword.line,
            sref.keyword.col,
        );
        let instance = match self.env.get_value(&self_token, None)? {
            Value::LoxInstance(instance) => instance,
            _ => {
                return Err(RuntimeError::internal(
                    &sref.keyword,
                    "'self' is not bound to an instance.",
                ))
            }
        };

        let target = match self.resolutions.target(&sref.keyword) {
            Some(target) => target,
            None => {
                return Err(RuntimeError::internal(
                    &sref.keyword,
                    "'super' was not resolved.",
                ))
            }
        };

        let method = LoxInstance::get_super(&instance, &sref.method, target, sref.class.is_some())?;
        self.invoke_property(method, &sref.method)
    }
}

fn number(value: &Value, token: &Token, position: &str) -> Result<f64, RuntimeError> {
    match value {
        Value::Number(n) => Ok(*n),
        _ => Err(RuntimeError::new(
            token,
            format!("{}: number expected.", position),
        )),
    }
}
