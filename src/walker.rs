use crate::diagnostics::Diagnostics;
use crate::expr::{ClassDecl, Expr, FunBody, FunDecl, Stmt};

/// A statement or function body enclosing the node being visited.
#[derive(Debug, Copy, Clone)]
pub enum Parent<'a> {
    Stmt(&'a Stmt),
    Body(&'a [Stmt]),
}

impl<'a> Parent<'a> {
    /// The statement list this parent holds directly, if it is a block.
    pub fn block(&self) -> Option<&'a [Stmt]> {
        match *self {
            Parent::Stmt(Stmt::Block(ref stmts)) => Some(stmts.as_slice()),
            Parent::Body(stmts) => Some(stmts),
            Parent::Stmt(_) => None,
        }
    }
}

pub struct WalkContext<'a, 'd> {
    parents: Vec<Parent<'a>>,
    pub diagnostics: &'d mut Diagnostics,
}

impl<'a, 'd> WalkContext<'a, 'd> {
    /// `parent(0)` is the innermost enclosing statement or body.
    pub fn parent(&self, depth: usize) -> Option<Parent<'a>> {
        self.parents.iter().rev().nth(depth).copied()
    }
}

/// Callbacks of one analysis pass. Every hook defaults to doing nothing.
///
/// `enter_stmt` runs before the statement becomes a parent, so inside it
/// `ctx.parent(0)` is the statement's container.
pub trait Pass<'a> {
    fn enter_stmt(&mut self, _stmt: &'a Stmt, _ctx: &mut WalkContext<'a, '_>) {}
    fn leave_stmt(&mut self, _stmt: &'a Stmt, _ctx: &mut WalkContext<'a, '_>) {}

    fn enter_expr(&mut self, _expr: &'a Expr, _ctx: &mut WalkContext<'a, '_>) {}
    fn leave_expr(&mut self, _expr: &'a Expr, _ctx: &mut WalkContext<'a, '_>) {}

    /// Functions, lambdas, methods and class methods.
    fn enter_function(&mut self, _decl: &'a FunDecl, _ctx: &mut WalkContext<'a, '_>) {}
    fn leave_function(&mut self, _decl: &'a FunDecl, _ctx: &mut WalkContext<'a, '_>) {}

    /// Brackets the instance methods of a class (class methods come first,
    /// outside these calls).
    fn enter_methods(&mut self, _decl: &'a ClassDecl, _ctx: &mut WalkContext<'a, '_>) {}
    fn leave_methods(&mut self, _decl: &'a ClassDecl, _ctx: &mut WalkContext<'a, '_>) {}
}

pub fn walk<'a, P: Pass<'a>>(pass: &mut P, stmts: &'a [Stmt], diagnostics: &mut Diagnostics) {
    let mut ctx = WalkContext {
        parents: Vec::new(),
        diagnostics,
    };
    for stmt in stmts {
        walk_stmt(pass, stmt, &mut ctx);
    }
}

fn walk_stmt<'a, P: Pass<'a>>(pass: &mut P, stmt: &'a Stmt, ctx: &mut WalkContext<'a, '_>) {
    pass.enter_stmt(stmt, ctx);
    ctx.parents.push(Parent::Stmt(stmt));

    match stmt {
        Stmt::Expr(expr) | Stmt::Print(expr) | Stmt::Last(expr) => walk_expr(pass, expr, ctx),
        Stmt::VarDecl(_, maybe_init) => {
            if let Some(init) = maybe_init {
                walk_expr(pass, init, ctx)
            }
        }
        Stmt::FunDecl(decl) => walk_function(pass, decl, ctx),
        Stmt::ClassDecl(decl) => {
            for method in decl.class_methods.iter() {
                walk_function(pass, method, ctx);
            }
            pass.enter_methods(decl, ctx);
            for method in decl.methods.iter() {
                walk_function(pass, method, ctx);
            }
            pass.leave_methods(decl, ctx);
        }
        Stmt::Block(stmts) => {
            for stmt in stmts.iter() {
                walk_stmt(pass, stmt, ctx);
            }
        }
        Stmt::If(cond, then_branch, maybe_else_branch) => {
            walk_expr(pass, cond, ctx);
            walk_stmt(pass, then_branch, ctx);
            if let Some(else_branch) = maybe_else_branch {
                walk_stmt(pass, else_branch, ctx);
            }
        }
        Stmt::While(_, cond, body) => {
            walk_expr(pass, cond, ctx);
            walk_stmt(pass, body, ctx);
        }
        Stmt::ContinueCatcher(body) => walk_stmt(pass, body, ctx),
        Stmt::ForBlock(body, updater) => {
            walk_stmt(pass, body, ctx);
            walk_stmt(pass, updater, ctx);
        }
        Stmt::Return(_, maybe_value) => {
            if let Some(value) = maybe_value {
                walk_expr(pass, value, ctx)
            }
        }
        Stmt::Break(_) | Stmt::Continue(_) => {}
    }

    ctx.parents.pop();
    pass.leave_stmt(stmt, ctx);
}

fn walk_function<'a, P: Pass<'a>>(pass: &mut P, decl: &'a FunDecl, ctx: &mut WalkContext<'a, '_>) {
    pass.enter_function(decl, ctx);
    match &decl.body {
        FunBody::Block(stmts) => {
            ctx.parents.push(Parent::Body(stmts));
            for stmt in stmts.iter() {
                walk_stmt(pass, stmt, ctx);
            }
            ctx.parents.pop();
        }
        FunBody::Expr(expr) => walk_expr(pass, expr, ctx),
    }
    pass.leave_function(decl, ctx);
}

fn walk_expr<'a, P: Pass<'a>>(pass: &mut P, expr: &'a Expr, ctx: &mut WalkContext<'a, '_>) {
    pass.enter_expr(expr, ctx);

    match expr {
        Expr::Literal(_) | Expr::Variable(_) | Expr::Super(_) => {}
        Expr::Unary(_, operand) | Expr::Grouping(operand) | Expr::TypeCheck(operand, _) => {
            walk_expr(pass, operand, ctx)
        }
        Expr::Binary(left, _, right) => {
            walk_expr(pass, left, ctx);
            walk_expr(pass, right, ctx);
        }
        Expr::Ternary {
            condition,
            then_branch,
            else_branch,
            ..
        } => {
            walk_expr(pass, condition, ctx);
            walk_expr(pass, then_branch, ctx);
            walk_expr(pass, else_branch, ctx);
        }
        Expr::Call(callee, _, args) => {
            walk_expr(pass, callee, ctx);
            for arg in args.iter() {
                walk_expr(pass, arg, ctx);
            }
        }
        Expr::Get(object, _) => walk_expr(pass, object, ctx),
        Expr::Set(object, _, value) => {
            walk_expr(pass, object, ctx);
            walk_expr(pass, value, ctx);
        }
        Expr::Assign(_, value) => walk_expr(pass, value, ctx),
        Expr::Lambda(decl) => walk_function(pass, decl, ctx),
    }

    pass.leave_expr(expr, ctx);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser;
    use crate::scanner;

    #[derive(Default)]
    struct Recorder {
        events: Vec<String>,
        max_parents: usize,
    }

    impl<'a> Pass<'a> for Recorder {
        fn enter_stmt(&mut self, stmt: &'a Stmt, ctx: &mut WalkContext<'a, '_>) {
            let name = match stmt {
                Stmt::Print(_) => "print",
                Stmt::Block(_) => "block",
                Stmt::Return(..) => "return",
                Stmt::FunDecl(_) => "fun",
                Stmt::ClassDecl(_) => "class",
                _ => "stmt",
            };
            self.events.push(name.to_string());
            self.max_parents = self.max_parents.max(ctx.parents.len());
        }

        fn enter_function(&mut self, decl: &'a FunDecl, _ctx: &mut WalkContext<'a, '_>) {
            self.events.push(format!("enter {}", decl.name.lexeme));
        }

        fn leave_function(&mut self, decl: &'a FunDecl, _ctx: &mut WalkContext<'a, '_>) {
            self.events.push(format!("leave {}", decl.name.lexeme));
        }

        fn enter_methods(&mut self, _decl: &'a ClassDecl, _ctx: &mut WalkContext<'a, '_>) {
            self.events.push("methods".to_string());
        }

        fn enter_expr(&mut self, expr: &'a Expr, _ctx: &mut WalkContext<'a, '_>) {
            if let Expr::Variable(name) = expr {
                self.events.push(format!("var {}", name.lexeme));
            }
        }
    }

    fn record(code: &str) -> Recorder {
        let mut diagnostics = Diagnostics::default();
        let tokens = scanner::scan_tokens(code, &mut diagnostics);
        let stmts = parser::parse(tokens, &mut diagnostics);
        assert!(!diagnostics.has_error(), "{}", diagnostics.stderr());

        let mut recorder = Recorder::default();
        walk(&mut recorder, &stmts, &mut diagnostics);
        recorder
    }

    #[test]
    fn test_visit_order() {
        let recorder = record("fun f(a) { { print a; } return a; }");
        assert_eq!(
            recorder.events,
            vec![
                "fun", "enter f", "block", "print", "var a", "return", "var a", "leave f"
            ]
        );
        // fun, body, block
        assert_eq!(recorder.max_parents, 3);
    }

    #[test]
    fn test_class_methods_precede_methods() {
        let recorder = record("class C { m() {} class s() {} }");
        assert_eq!(
            recorder.events,
            vec!["class", "enter s", "leave s", "methods", "enter m", "leave m"]
        );
    }

    #[test]
    fn test_parent_block() {
        let stmts = vec![Stmt::Block(Vec::new())];
        assert!(Parent::Stmt(&stmts[0]).block().is_some());
        assert!(Parent::Body(&stmts).block().is_some());
    }
}
