use crate::analyzer::Resolutions;
use crate::environment::{Environment, Symbol, SymbolKind};
use crate::expr::{ClassDecl, Expr, FunDecl, FunctionKind, Stmt, SuperRef};
use crate::scanner::Token;
use crate::value::Value;
use crate::walker::{Pass, WalkContext};

struct FunctionFrame {
    kind: FunctionKind,
    /// Name of a `fun` declaration; uses from inside its own body do not
    /// count.
    declared: Option<Token>,
}

/// Mirrors the runtime scopes to bind every identifier use to its
/// declaration, reporting undefined names, illegal writes, bad `super`
/// references and unused locals.
pub struct Symbols<'a> {
    env: Environment,
    resolutions: Resolutions,
    functions: Vec<FunctionFrame>,
    classes: Vec<&'a ClassDecl>,
}

impl<'a> Symbols<'a> {
    pub fn new(env: Environment) -> Symbols<'a> {
        Symbols {
            env,
            resolutions: Resolutions::default(),
            functions: Vec::new(),
            classes: Vec::new(),
        }
    }

    pub fn into_resolutions(self) -> Resolutions {
        self.resolutions
    }

    fn define(&mut self, token: &Token, kind: SymbolKind, ctx: &mut WalkContext<'a, '_>) {
        if let Err(err) = self.env.define_symbol(token, kind, Value::Nil, false) {
            ctx.diagnostics.error_at_token(&err.token, &err.message);
        }
    }

    fn resolve(&mut self, token: &Token, is_read: bool, ctx: &mut WalkContext<'a, '_>) -> Option<Symbol> {
        let found = self.env.with_symbol(token, None, |symbol| {
            if is_read {
                symbol.uses += 1;
            }
            symbol.clone()
        });

        match found {
            Ok(symbol) => {
                self.resolutions.bind(token, symbol.token.id);
                Some(symbol)
            }
            Err(err) => {
                ctx.diagnostics.error_at_token(token, &err.message);
                None
            }
        }
    }

    fn pop_scope(&mut self, ctx: &mut WalkContext<'a, '_>) {
        for symbol in self.env.local_symbols() {
            let reportable = matches!(
                symbol.kind,
                SymbolKind::Var | SymbolKind::Fun | SymbolKind::Class
            );
            if reportable && symbol.uses == 0 {
                ctx.diagnostics
                    .warning_at_token(&symbol.token, &format!("{} is unused.", symbol.name()));
            }
        }
        self.env.pop();
    }

    fn enter_class(&mut self, decl: &'a ClassDecl, ctx: &mut WalkContext<'a, '_>) {
        self.define(&decl.name, SymbolKind::Class, ctx);

        let mut seen: Vec<&Token> = Vec::new();
        for superclass in decl.superclasses.iter() {
            if superclass.lex_equals(&decl.name) {
                ctx.diagnostics
                    .error_at_token(superclass, "A class can't inherit from itself.");
                continue;
            }
            if seen.iter().any(|other| other.lex_equals(superclass)) {
                ctx.diagnostics
                    .error_at_token(superclass, "A class can't be inherited more than once.");
                continue;
            }
            seen.push(superclass);
            self.resolve(superclass, true, ctx);
        }

        self.classes.push(decl);
        self.env.push(true);
    }

    fn resolve_super(&mut self, sref: &SuperRef, ctx: &mut WalkContext<'a, '_>) {
        let class = match self.classes.last() {
            Some(class) => *class,
            None => {
                ctx.diagnostics
                    .error_at_token(&sref.keyword, "'super' used outside of a class.");
                return;
            }
        };

        let in_class_method = self
            .functions
            .iter()
            .rev()
            .find(|frame| matches!(frame.kind, FunctionKind::Method | FunctionKind::ClassMethod))
            .map_or(false, |frame| frame.kind == FunctionKind::ClassMethod);
        if in_class_method {
            ctx.diagnostics
                .error_at_token(&sref.keyword, "Can't use 'super' in a class method.");
            return;
        }

        if class.superclasses.is_empty() {
            ctx.diagnostics.error_at_token(
                &sref.keyword,
                &format!("Class {} has no superclasses.", class.name.lexeme),
            );
            return;
        }

        match &sref.class {
            Some(explicit) => {
                match class.superclasses.iter().find(|s| s.lex_equals(explicit)) {
                    Some(superclass) => {
                        if let Some(target) = self.resolutions.target(superclass) {
                            self.resolutions.bind(&sref.keyword, target);
                        }
                    }
                    None => ctx.diagnostics.error_at_token(
                        explicit,
                        &format!(
                            "Class {} is not a direct superclass of {}.",
                            explicit.lexeme, class.name.lexeme
                        ),
                    ),
                }
            }
            None => self.resolutions.bind(&sref.keyword, class.name.id),
        }
    }
}

impl<'a> Pass<'a> for Symbols<'a> {
    fn enter_stmt(&mut self, stmt: &'a Stmt, ctx: &mut WalkContext<'a, '_>) {
        match stmt {
            Stmt::Block(_) => self.env.push(false),
            Stmt::ClassDecl(decl) => self.enter_class(decl, ctx),
            _ => {}
        }
    }

    fn leave_stmt(&mut self, stmt: &'a Stmt, ctx: &mut WalkContext<'a, '_>) {
        match stmt {
            Stmt::Block(_) => self.pop_scope(ctx),
            Stmt::VarDecl(name, _) => self.define(name, SymbolKind::Var, ctx),
            Stmt::ClassDecl(_) => {
                self.pop_scope(ctx);
                self.classes.pop();
            }
            _ => {}
        }
    }

    fn enter_expr(&mut self, expr: &'a Expr, ctx: &mut WalkContext<'a, '_>) {
        match expr {
            Expr::Variable(name) => {
                self.resolve(name, true, ctx);
            }
            Expr::Assign(name, _) => {
                if let Some(symbol) = self.resolve(name, false, ctx) {
                    if symbol.readonly {
                        ctx.diagnostics.error_at_token(
                            name,
                            &format!("Readonly symbol '{}' cannot be modified.", name.lexeme),
                        );
                    }
                }
            }
            Expr::Super(sref) => self.resolve_super(sref, ctx),
            _ => {}
        }
    }

    fn enter_function(&mut self, decl: &'a FunDecl, ctx: &mut WalkContext<'a, '_>) {
        let declared = if decl.kind == FunctionKind::Function {
            self.define(&decl.name, SymbolKind::Fun, ctx);
            Some(decl.name.clone())
        } else {
            None
        };
        self.functions.push(FunctionFrame {
            kind: decl.kind,
            declared,
        });

        // the body shares this scope with the parameters
        self.env.push(false);
        for param in decl.params.iter() {
            self.define(param, SymbolKind::Param, ctx);
        }
    }

    fn leave_function(&mut self, _decl: &'a FunDecl, ctx: &mut WalkContext<'a, '_>) {
        self.pop_scope(ctx);

        if let Some(FunctionFrame {
            declared: Some(name),
            ..
        }) = self.functions.pop()
        {
            let reset = self
                .env
                .with_symbol(&name, Some(name.id), |symbol| symbol.uses = 0);
            if reset.is_err() {
                tracing::warn!(name = %name.lexeme, "declared function vanished from its scope");
            }
        }
    }

    fn enter_methods(&mut self, decl: &'a ClassDecl, ctx: &mut WalkContext<'a, '_>) {
        self.env.push(true);
        if let Err(err) =
            self.env
                .define_symbol(&decl.self_token, SymbolKind::Special, Value::Nil, true)
        {
            ctx.diagnostics.error_at_token(&err.token, &err.message);
        }
    }

    fn leave_methods(&mut self, _decl: &'a ClassDecl, ctx: &mut WalkContext<'a, '_>) {
        self.pop_scope(ctx);
    }
}

#[cfg(test)]
mod tests {
    use crate::analyzer::{analyze, Resolutions};
    use crate::diagnostics::Diagnostics;
    use crate::environment::Environment;
    use crate::expr::{Expr, Stmt};
    use crate::parser;
    use crate::scanner;
    use pretty_assertions::assert_eq;

    fn check(code: &str) -> (Vec<Stmt>, Resolutions, Diagnostics) {
        let mut diagnostics = Diagnostics::default();
        let tokens = scanner::scan_tokens(code, &mut diagnostics);
        let stmts = parser::parse(tokens, &mut diagnostics);
        assert!(!diagnostics.has_error(), "{}", diagnostics.stderr());
        let resolutions = analyze(&stmts, &Environment::default(), &mut diagnostics);
        (stmts, resolutions, diagnostics)
    }

    fn check_stderr(code: &str, expected: &str) {
        let (_, _, diagnostics) = check(code);
        assert_eq!(diagnostics.stderr(), expected);
    }

    #[test]
    fn test_undefined_identifier() {
        check_stderr(
            "{ var a = 1; print a; }\nprint a;",
            "[line 2] Error at 'a': Undefined identifier 'a'.\n",
        );
    }

    #[test]
    fn test_no_hoisting() {
        check_stderr(
            "fun f() { return g(); }\nfun g() { return 1; }",
            "[line 1] Error at 'g': Undefined identifier 'g'.\n",
        );
    }

    #[test]
    fn test_redeclaration_in_block() {
        check_stderr(
            "{\nvar a = 1;\nvar a = 2;\nprint a;\n}",
            "[line 3] Error at 'a': a (at line 2) cannot be redeclared as a new variable.\n",
        );
        // globals may be redefined
        check_stderr("var a = 1; var a = 2; print a;", "");
    }

    #[test]
    fn test_unused_locals() {
        check_stderr(
            "fun f(unusedParam) {\nvar x = 1;\nfun g() {}\nclass C {}\n}",
            "[line 2] Warning at 'x': x is unused.\n\
             [line 3] Warning at 'g': g is unused.\n\
             [line 4] Warning at 'C': C is unused.\n",
        );
    }

    #[test]
    fn test_recursion_is_not_a_use() {
        check_stderr(
            "{\nfun loop(n) { if (n > 0) loop(n - 1); }\n}",
            "[line 2] Warning at 'loop': loop is unused.\n",
        );
        check_stderr(
            "{\nfun loop(n) { if (n > 0) loop(n - 1); }\nloop(3);\n}",
            "",
        );
    }

    #[test]
    fn test_assignment_is_not_a_read() {
        check_stderr(
            "{\nvar a;\na = 1;\n}",
            "[line 2] Warning at 'a': a is unused.\n",
        );
    }

    #[test]
    fn test_readonly_targets() {
        check_stderr(
            "class A { m() { self = nil; } }",
            "[line 1] Error at 'self': Readonly symbol 'self' cannot be modified.\n",
        );
    }

    #[test]
    fn test_self_outside_methods() {
        check_stderr(
            "class A { class make() { return self; } }",
            "[line 1] Error at 'self': Undefined identifier 'self'.\n",
        );
        check_stderr(
            "print self;",
            "[line 1] Error at 'self': Undefined identifier 'self'.\n",
        );
    }

    #[test]
    fn test_inheritance_errors() {
        check_stderr(
            "class A < A {}",
            "[line 1] Error at 'A': A class can't inherit from itself.\n",
        );
        check_stderr(
            "class A {} class B < A, A {}",
            "[line 1] Error at 'A': A class can't be inherited more than once.\n",
        );
        check_stderr(
            "class B < Missing {}",
            "[line 1] Error at 'Missing': Undefined identifier 'Missing'.\n",
        );
    }

    #[test]
    fn test_super_errors() {
        check_stderr(
            "fun f() { return super.m; }",
            "[line 1] Error at 'super': 'super' used outside of a class.\n",
        );
        check_stderr(
            "class A { m() { return super.m(); } }",
            "[line 1] Error at 'super': Class A has no superclasses.\n",
        );
        check_stderr(
            "class A {} class B < A { class s() { return super.s(); } }",
            "[line 1] Error at 'super': Can't use 'super' in a class method.\n",
        );
        check_stderr(
            "class A {} class C {} class B < A { m() { return super(C).m(); } }",
            "[line 1] Error at 'C': Class C is not a direct superclass of B.\n",
        );
    }

    fn super_keyword(stmts: &[Stmt], class_index: usize) -> crate::scanner::Token {
        match &stmts[class_index] {
            Stmt::ClassDecl(decl) => match &decl.methods[0].body {
                crate::expr::FunBody::Expr(Expr::Call(callee, _, _)) => match &**callee {
                    Expr::Super(sref) => sref.keyword.clone(),
                    other => panic!("expected super, got {:?}", other),
                },
                other => panic!("unexpected body {:?}", other),
            },
            other => panic!("expected class, got {:?}", other),
        }
    }

    #[test]
    fn test_super_targets() {
        let (stmts, resolutions, diagnostics) = check(
            "class A { m() 1; }\n\
             class B { m() 2; }\n\
             class C < A, B { m() super(B).m(); }\n\
             class D < A, B { m() super.m(); }",
        );
        assert_eq!(diagnostics.stderr(), "");

        let class_name = |index: usize| match &stmts[index] {
            Stmt::ClassDecl(decl) => decl.name.id,
            _ => panic!("expected class"),
        };
        assert_eq!(resolutions.target(&super_keyword(&stmts, 2)), Some(class_name(1)));
        assert_eq!(resolutions.target(&super_keyword(&stmts, 3)), Some(class_name(3)));
    }

    #[test]
    fn test_shadowing_binds_innermost() {
        let (stmts, resolutions, _) = check("var a = 1; { var a = 2; print a; }");
        let (inner_decl, use_site) = match &stmts[1] {
            Stmt::Block(inner) => match (&inner[0], &inner[1]) {
                (Stmt::VarDecl(decl, _), Stmt::Print(Expr::Variable(use_site))) => {
                    (decl.id, use_site.clone())
                }
                other => panic!("unexpected block {:?}", other),
            },
            other => panic!("expected block, got {:?}", other),
        };
        assert_eq!(resolutions.target(&use_site), Some(inner_decl));
    }
}
