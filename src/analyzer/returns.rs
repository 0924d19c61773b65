use std::collections::HashSet;

use crate::ast_printer::AstPrinter;
use crate::callable::INIT;
use crate::expr::{FunDecl, FunctionKind, Stmt};
use crate::scanner::Token;
use crate::walker::{Parent, Pass, WalkContext};

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum ReturnKind {
    Cannot,
    VoidOnly,
    Any,
}

/// Checks where `return` may appear and flags statements it makes
/// unreachable.
#[derive(Default)]
pub struct Returns {
    kinds: Vec<ReturnKind>,
    // statements already flagged as dead
    reported: HashSet<*const Stmt>,
}

impl Returns {
    fn current(&self) -> ReturnKind {
        self.kinds.last().copied().unwrap_or(ReturnKind::Cannot)
    }

    /// Flags the statements after `ret` in its block, then after that block
    /// in its own enclosing block, and so on. Stops at a function body or at
    /// any statement that is not a plain block (if, loops).
    fn report_dead_code<'a>(&mut self, ret: &'a Stmt, keyword: &Token, ctx: &mut WalkContext<'a, '_>) {
        let mut child = ret;
        let mut depth = 0;

        while let Some(parent) = ctx.parent(depth) {
            let stmts = match parent.block() {
                Some(stmts) => stmts,
                None => return,
            };

            if let Some(pos) = stmts.iter().position(|stmt| std::ptr::eq(stmt, child)) {
                for dead in stmts[pos + 1..].iter() {
                    if self.reported.insert(dead as *const Stmt) {
                        let printed = AstPrinter::one_line().print_stmt(dead);
                        ctx.diagnostics
                            .warning_at_token(keyword, &format!("Dead code: {}", printed));
                    }
                }
            }

            match parent {
                Parent::Stmt(block) => child = block,
                Parent::Body(_) => return,
            }
            depth += 1;
        }
    }
}

impl<'a> Pass<'a> for Returns {
    fn enter_function(&mut self, decl: &'a FunDecl, _ctx: &mut WalkContext<'a, '_>) {
        let kind = if decl.kind == FunctionKind::Method && decl.name.lexeme == INIT {
            ReturnKind::VoidOnly
        } else {
            ReturnKind::Any
        };
        self.kinds.push(kind);
    }

    fn leave_function(&mut self, _decl: &'a FunDecl, _ctx: &mut WalkContext<'a, '_>) {
        self.kinds.pop();
    }

    fn enter_stmt(&mut self, stmt: &'a Stmt, ctx: &mut WalkContext<'a, '_>) {
        if let Stmt::Return(keyword, value) = stmt {
            match self.current() {
                ReturnKind::Cannot => {
                    ctx.diagnostics
                        .error_at_token(keyword, "Return outside function.");
                }
                ReturnKind::VoidOnly if value.is_some() => {
                    ctx.diagnostics
                        .error_at_token(keyword, "Initializers cannot return a value.");
                }
                _ => {}
            }
            self.report_dead_code(stmt, keyword, ctx);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Diagnostics;
    use crate::parser;
    use crate::scanner;
    use crate::walker;
    use pretty_assertions::assert_eq;

    fn check(code: &str) -> Diagnostics {
        let mut diagnostics = Diagnostics::default();
        let tokens = scanner::scan_tokens(code, &mut diagnostics);
        let stmts = parser::parse(tokens, &mut diagnostics);
        assert!(!diagnostics.has_error(), "{}", diagnostics.stderr());
        walker::walk(&mut Returns::default(), &stmts, &mut diagnostics);
        diagnostics
    }

    #[test]
    fn test_return_outside_function() {
        let diagnostics = check("return;");
        assert_eq!(
            diagnostics.stderr(),
            "[line 1] Error at 'return': Return outside function.\n"
        );
        assert_eq!(check("fun f() { return 1; } var g = fun () { return 2; };").stderr(), "");
    }

    #[test]
    fn test_initializer_return() {
        let diagnostics = check("class A { init() { return 1; } }");
        assert_eq!(
            diagnostics.stderr(),
            "[line 1] Error at 'return': Initializers cannot return a value.\n"
        );
        assert_eq!(check("class A { init() { return; } }").stderr(), "");
        // only instance methods are initializers
        assert_eq!(check("class A { class init() { return 1; } }").stderr(), "");
    }

    #[test]
    fn test_dead_code_reported_once_per_statement() {
        let diagnostics = check("fun f() { return 1; return 2; print 3; }");
        assert_eq!(
            diagnostics.stderr(),
            "[line 1] Warning at 'return': Dead code: return 2;\n\
             [line 1] Warning at 'return': Dead code: print 3;\n"
        );
    }

    #[test]
    fn test_dead_code_through_plain_blocks() {
        let diagnostics = check("fun f() {\n{ return; print 1; }\nprint 2;\n}");
        assert_eq!(diagnostics.warning_count(), 2);
        assert_eq!(
            diagnostics.stderr(),
            "[line 2] Warning at 'return': Dead code: print 1;\n\
             [line 2] Warning at 'return': Dead code: print 2;\n"
        );
    }

    #[test]
    fn test_dead_code_stops_at_branches_and_loops() {
        let diagnostics = check(
            "fun f(a) {\n\
               if (a) { return 1; }\n\
               while (a) { return 2; }\n\
               return 3;\n\
             }",
        );
        assert_eq!(diagnostics.stderr(), "");
    }
}
