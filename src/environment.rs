use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::interpreter::RuntimeError;
use crate::scanner::{Token, TokenId};
use crate::value::Value;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum SymbolKind {
    Var,
    Param,
    Fun,
    Class,
    Special,
}

impl fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SymbolKind::Var => write!(f, "variable"),
            SymbolKind::Param => write!(f, "parameter"),
            SymbolKind::Fun => write!(f, "function"),
            SymbolKind::Class => write!(f, "class"),
            SymbolKind::Special => write!(f, "special"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Symbol {
    /// The declaring token; its id is what the analyzer binds uses to.
    pub token: Token,
    pub value: Value,
    pub readonly: bool,
    pub kind: SymbolKind,
    pub uses: usize,
}

impl Symbol {
    pub fn name(&self) -> &str {
        &self.token.lexeme
    }
}

type ScopeRef = Rc<RefCell<Scope>>;

struct Scope {
    symbols: HashMap<String, Symbol>,
    outer: Option<ScopeRef>,
    readonly: bool,
    one_definition_only: bool,
}

impl Scope {
    fn new(outer: Option<ScopeRef>, readonly: bool, one_definition_only: bool) -> ScopeRef {
        Rc::new(RefCell::new(Scope {
            symbols: HashMap::new(),
            outer,
            readonly,
            one_definition_only,
        }))
    }

    fn define(
        &mut self,
        token: &Token,
        kind: SymbolKind,
        value: Value,
        readonly: bool,
    ) -> Result<(), RuntimeError> {
        if self.one_definition_only {
            if let Some(previous) = self.symbols.get(&token.lexeme) {
                return Err(RuntimeError::new(
                    token,
                    format!(
                        "{} (at line {}) cannot be redeclared as a new {}.",
                        previous.name(),
                        previous.token.line,
                        kind
                    ),
                ));
            }
        }

        self.symbols.insert(
            token.lexeme.clone(),
            Symbol {
                token: token.clone(),
                value,
                readonly: self.readonly || readonly,
                kind,
                uses: 0,
            },
        );
        Ok(())
    }
}

/// A captured position in the scope chain. Functions, lambdas and methods
/// keep one and run their body on top of it.
#[derive(Clone)]
pub struct Scoping(ScopeRef);

impl fmt::Debug for Scoping {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Scoping")
    }
}

impl Scoping {
    /// Extends the captured chain with a readonly scope binding `self`.
    pub fn bind(&self, self_token: &Token, instance: Value) -> Scoping {
        let bound = Scope::new(Some(Rc::clone(&self.0)), true, true);
        bound.borrow_mut().symbols.insert(
            self_token.lexeme.clone(),
            Symbol {
                token: self_token.clone(),
                value: instance,
                readonly: true,
                kind: SymbolKind::Special,
                uses: 0,
            },
        );
        Scoping(bound)
    }
}

/// The scope chain. The root holds the natives and is readonly; above it
/// sits the user-global scope, where redefinition is allowed.
pub struct Environment {
    natives: ScopeRef,
    scope: ScopeRef,
    swapped: Vec<ScopeRef>,
}

impl Default for Environment {
    fn default() -> Environment {
        let natives = Scope::new(None, true, true);
        let scope = Scope::new(Some(Rc::clone(&natives)), false, false);
        Environment {
            natives,
            scope,
            swapped: Vec::new(),
        }
    }
}

impl Environment {
    /// Drops every user definition; natives survive.
    pub fn reset(&mut self) {
        self.scope = Scope::new(Some(Rc::clone(&self.natives)), false, false);
        self.swapped.clear();
    }

    /// A copy of the user-global scope over the same natives, for the
    /// analyzer to work on without touching runtime state.
    pub fn globals_snapshot(&self) -> Environment {
        let globals = self.user_globals();
        let copy = Scope::new(Some(Rc::clone(&self.natives)), false, false);
        copy.borrow_mut().symbols = globals.borrow().symbols.clone();
        Environment {
            natives: Rc::clone(&self.natives),
            scope: copy,
            swapped: Vec::new(),
        }
    }

    pub fn push(&mut self, readonly: bool) {
        self.scope = Scope::new(Some(Rc::clone(&self.scope)), readonly, true);
    }

    pub fn pop(&mut self) {
        let outer = self.scope.borrow().outer.clone();
        match outer {
            Some(outer) => self.scope = outer,
            None => tracing::warn!("attempt to pop the native scope"),
        }
    }

    pub fn get_scoping(&self) -> Scoping {
        Scoping(Rc::clone(&self.scope))
    }

    /// Enters a call: the callee's captured chain plus a fresh scope for
    /// its parameters replaces the caller's chain until `unswap`.
    pub fn swap(&mut self, scoping: &Scoping) {
        let caller = std::mem::replace(&mut self.scope, Rc::clone(&scoping.0));
        self.swapped.push(caller);
        self.push(false);
    }

    pub fn unswap(&mut self) {
        match self.swapped.pop() {
            Some(caller) => self.scope = caller,
            None => tracing::warn!("unswap without a matching swap"),
        }
    }

    pub fn define_symbol(
        &mut self,
        token: &Token,
        kind: SymbolKind,
        value: Value,
        readonly: bool,
    ) -> Result<(), RuntimeError> {
        self.scope.borrow_mut().define(token, kind, value, readonly)
    }

    pub fn define_native(&mut self, token: &Token, kind: SymbolKind, value: Value) {
        // natives are registered once per name; a second registration replaces
        // the first
        self.natives.borrow_mut().symbols.insert(
            token.lexeme.clone(),
            Symbol {
                token: token.clone(),
                value,
                readonly: true,
                kind,
                uses: 0,
            },
        );
    }

    /// Symbols of the innermost scope, ordered by source position.
    pub fn local_symbols(&self) -> Vec<Symbol> {
        let mut symbols: Vec<Symbol> = self.scope.borrow().symbols.values().cloned().collect();
        symbols.sort_by_key(|sym| (sym.token.line, sym.token.col));
        symbols
    }

    /// Runs `f` on the innermost symbol named like `token`. With a `target`,
    /// only the symbol declared by that token matches, so a shadowing
    /// declaration added after the use was resolved is skipped. Globals are
    /// matched by name alone since they may be redefined.
    pub fn with_symbol<R>(
        &self,
        token: &Token,
        target: Option<TokenId>,
        f: impl FnOnce(&mut Symbol) -> R,
    ) -> Result<R, RuntimeError> {
        let mut current = Some(Rc::clone(&self.scope));
        while let Some(scope) = current {
            let mut scope = scope.borrow_mut();
            let redefinable = !scope.one_definition_only;
            if let Some(symbol) = scope.symbols.get_mut(&token.lexeme) {
                if redefinable || target.map_or(true, |id| id == symbol.token.id) {
                    return Ok(f(symbol));
                }
            }
            current = scope.outer.clone();
        }

        Err(RuntimeError::new(
            token,
            format!("Undefined identifier '{}'.", token.lexeme),
        ))
    }

    pub fn get_value(&self, token: &Token, target: Option<TokenId>) -> Result<Value, RuntimeError> {
        let value = self.with_symbol(token, target, |symbol| symbol.value.clone())?;
        if let Value::Uninitialized = value {
            return Err(RuntimeError::new(
                token,
                format!("Uninitialized variable '{}'.", token.lexeme),
            ));
        }
        Ok(value)
    }

    pub fn assign_symbol(
        &self,
        token: &Token,
        value: Value,
        target: Option<TokenId>,
    ) -> Result<(), RuntimeError> {
        let assigned = self.with_symbol(token, target, |symbol| {
            if symbol.readonly {
                return false;
            }
            symbol.value = value;
            true
        })?;

        if !assigned {
            return Err(RuntimeError::new(
                token,
                format!("Readonly symbol '{}' cannot be modified.", token.lexeme),
            ));
        }
        Ok(())
    }

    fn user_globals(&self) -> ScopeRef {
        let mut current = match self.swapped.first() {
            Some(bottom) => Rc::clone(bottom),
            None => Rc::clone(&self.scope),
        };
        loop {
            let outer = current.borrow().outer.clone();
            match outer {
                Some(outer) if !Rc::ptr_eq(&outer, &self.natives) => current = outer,
                _ => return current,
            }
        }
    }
}
