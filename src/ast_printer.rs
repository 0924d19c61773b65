use crate::expr::{BinaryOpTy, ClassDecl, Expr, FunBody, FunDecl, Literal, Stmt, SuperRef, UnaryOpTy};
use crate::scanner::Token;

/// Renders the AST back to source text that parses to the same tree.
/// Desugared forms (`a += b`, `++a`, `for`) are printed in their sugared
/// spelling.
pub struct AstPrinter {
    multi_line: bool,
    depth: usize,
}

impl AstPrinter {
    pub fn multi_line() -> AstPrinter {
        AstPrinter {
            multi_line: true,
            depth: 0,
        }
    }

    pub fn one_line() -> AstPrinter {
        AstPrinter {
            multi_line: false,
            depth: 0,
        }
    }

    pub fn print_program(&mut self, stmts: &[Stmt]) -> String {
        let printed: Vec<String> = stmts.iter().map(|stmt| self.stmt(stmt)).collect();
        printed.join(self.separator())
    }

    pub fn print_stmt(&mut self, stmt: &Stmt) -> String {
        self.stmt(stmt)
    }

    fn separator(&self) -> &'static str {
        if self.multi_line {
            "\n"
        } else {
            " "
        }
    }

    fn indent(&self) -> String {
        "    ".repeat(self.depth)
    }

    fn stmt(&mut self, stmt: &Stmt) -> String {
        match stmt {
            Stmt::Expr(expr) => format!("{};", self.expr(expr)),
            Stmt::Print(expr) => format!("print {};", self.expr(expr)),
            Stmt::Last(expr) => self.expr(expr),
            Stmt::VarDecl(name, None) => format!("var {};", name.lexeme),
            Stmt::VarDecl(name, Some(init)) => format!("var {} = {};", name.lexeme, self.expr(init)),
            Stmt::FunDecl(decl) => format!("fun {}", self.function(decl)),
            Stmt::ClassDecl(decl) => self.class(decl),
            Stmt::Block(stmts) => self.block(stmts),
            Stmt::If(cond, then_branch, None) => {
                format!("if ({}) {}", self.expr(cond), self.stmt(then_branch))
            }
            Stmt::If(cond, then_branch, Some(else_branch)) => format!(
                "if ({}) {} else {}",
                self.expr(cond),
                self.stmt(then_branch),
                self.stmt(else_branch)
            ),
            Stmt::While(_, cond, body) => match &**body {
                Stmt::ForBlock(body, updater) => format!(
                    "for (; {}; {}) {}",
                    self.expr(cond),
                    self.updater(updater),
                    self.stmt(body)
                ),
                body => format!("while ({}) {}", self.expr(cond), self.stmt(body)),
            },
            Stmt::ContinueCatcher(body) => self.stmt(body),
            Stmt::ForBlock(body, updater) => {
                format!("{} {}", self.stmt(body), self.stmt(updater))
            }
            Stmt::Return(_, None) => "return;".to_string(),
            Stmt::Return(_, Some(value)) => format!("return {};", self.expr(value)),
            Stmt::Break(_) => "break;".to_string(),
            Stmt::Continue(_) => "continue;".to_string(),
        }
    }

    fn updater(&mut self, updater: &Stmt) -> String {
        match updater {
            Stmt::Expr(expr) => self.expr(expr),
            other => self.stmt(other),
        }
    }

    fn block(&mut self, stmts: &[Stmt]) -> String {
        if stmts.is_empty() {
            return "{}".to_string();
        }

        let members: Vec<String> = stmts.iter().map(|stmt| self.member(stmt)).collect();
        self.close(members)
    }

    fn class(&mut self, decl: &ClassDecl) -> String {
        let mut header = format!("class {}", decl.name.lexeme);
        if !decl.superclasses.is_empty() {
            let names: Vec<&str> = decl
                .superclasses
                .iter()
                .map(|superclass| superclass.lexeme.as_str())
                .collect();
            header.push_str(&format!(" < {}", names.join(", ")));
        }

        if decl.methods.is_empty() && decl.class_methods.is_empty() {
            return format!("{} {{}}", header);
        }

        self.depth += 1;
        let mut members = Vec::new();
        for method in decl.class_methods.iter() {
            let printed = format!("class {}", self.function(method));
            members.push(self.indented(printed));
        }
        for method in decl.methods.iter() {
            let printed = self.function(method);
            members.push(self.indented(printed));
        }
        self.depth -= 1;

        format!("{} {}", header, self.close(members))
    }

    fn member(&mut self, stmt: &Stmt) -> String {
        self.depth += 1;
        let printed = self.stmt(stmt);
        let res = self.indented(printed);
        self.depth -= 1;
        res
    }

    fn indented(&self, printed: String) -> String {
        if self.multi_line {
            format!("{}{}", self.indent(), printed)
        } else {
            printed
        }
    }

    fn close(&self, members: Vec<String>) -> String {
        if self.multi_line {
            format!("{{\n{}\n{}}}", members.join("\n"), self.indent())
        } else {
            format!("{{ {} }}", members.join(" "))
        }
    }

    fn function(&mut self, decl: &FunDecl) -> String {
        let signature = if decl.is_property {
            format!("{}:", decl.name.lexeme)
        } else {
            format!("{}({})", decl.name.lexeme, params(&decl.params))
        };
        let body = match &decl.body {
            FunBody::Block(stmts) => self.block(stmts),
            FunBody::Expr(expr) => format!("{};", self.expr(expr)),
        };
        format!("{} {}", signature, body)
    }

    fn lambda(&mut self, decl: &FunDecl) -> String {
        let body = match &decl.body {
            FunBody::Block(stmts) => self.block(stmts),
            FunBody::Expr(expr) => self.expr(expr),
        };
        format!("fun ({}) {}", params(&decl.params), body)
    }

    fn expr(&mut self, expr: &Expr) -> String {
        match expr {
            Expr::Literal(lit) => literal(lit),
            Expr::Unary(op, operand) => {
                let sym = match op.ty {
                    UnaryOpTy::Minus => "-",
                    UnaryOpTy::Bang => "!",
                };
                let operand = self.expr(operand);
                // keep "- -x" from scanning as "--x"
                if operand.starts_with('-') {
                    format!("{} {}", sym, operand)
                } else {
                    format!("{}{}", sym, operand)
                }
            }
            Expr::Binary(left, op, right) => match op.ty {
                BinaryOpTy::Comma => format!("{}, {}", self.expr(left), self.expr(right)),
                ty => format!("{} {} {}", self.expr(left), binop_str(ty), self.expr(right)),
            },
            Expr::Ternary {
                condition,
                then_branch,
                else_branch,
                ..
            } => format!(
                "{} ? {} : {}",
                self.expr(condition),
                self.expr(then_branch),
                self.expr(else_branch)
            ),
            Expr::Call(callee, _, args) => {
                let callee = self.expr(callee);
                let args: Vec<String> = args.iter().map(|arg| self.expr(arg)).collect();
                format!("{}({})", callee, args.join(", "))
            }
            Expr::Get(object, name) => format!("{}.{}", self.expr(object), name.lexeme),
            Expr::Set(object, name, value) => self.set(object, name, value),
            Expr::Grouping(inner) => format!("({})", self.expr(inner)),
            Expr::Variable(name) => name.lexeme.clone(),
            Expr::Assign(name, value) => self.assign(name, value),
            Expr::Lambda(decl) => self.lambda(decl),
            Expr::Super(SuperRef {
                class: Some(class),
                method,
                ..
            }) => format!("super({}).{}", class.lexeme, method.lexeme),
            Expr::Super(SuperRef { method, .. }) => format!("super.{}", method.lexeme),
            Expr::TypeCheck(inner, _) => self.expr(inner),
        }
    }

    fn assign(&mut self, name: &Token, value: &Expr) -> String {
        if let Expr::Binary(left, op, right) = value {
            if let Expr::TypeCheck(target, operator) = &**left {
                return format!("{}{}", operator.lexeme, self.expr(target));
            }
            if let Expr::Variable(var) = &**left {
                if is_compoundable(op.ty) && var.lex_equals(name) {
                    return format!("{} {}= {}", name.lexeme, binop_str(op.ty), self.expr(right));
                }
            }
        }
        format!("{} = {}", name.lexeme, self.expr(value))
    }

    fn set(&mut self, object: &Expr, name: &Token, value: &Expr) -> String {
        let object = self.expr(object);
        if let Expr::Binary(left, op, right) = value {
            if let Expr::TypeCheck(target, operator) = &**left {
                return format!("{}{}", operator.lexeme, self.expr(target));
            }
            if let Expr::Get(get_object, get_name) = &**left {
                if is_compoundable(op.ty)
                    && get_name.lex_equals(name)
                    && self.expr(get_object) == object
                {
                    return format!(
                        "{}.{} {}= {}",
                        object,
                        name.lexeme,
                        binop_str(op.ty),
                        self.expr(right)
                    );
                }
            }
        }
        format!("{}.{} = {}", object, name.lexeme, self.expr(value))
    }
}

fn params(params: &[Token]) -> String {
    let names: Vec<&str> = params.iter().map(|param| param.lexeme.as_str()).collect();
    names.join(", ")
}

fn literal(lit: &Literal) -> String {
    match lit {
        Literal::Number(n) => format!("{}", n),
        Literal::String(s) => quote(s),
        Literal::True => "true".to_string(),
        Literal::False => "false".to_string(),
        Literal::Nil => "nil".to_string(),
    }
}

fn quote(s: &str) -> String {
    let mut res = String::with_capacity(s.len() + 2);
    res.push('"');
    for c in s.chars() {
        match c {
            '\n' => res.push_str("\\n"),
            '\t' => res.push_str("\\t"),
            '\r' => res.push_str("\\r"),
            '\0' => res.push_str("\\0"),
            '\\' => res.push_str("\\\\"),
            '"' => res.push_str("\\\""),
            c => res.push(c),
        }
    }
    res.push('"');
    res
}

fn is_compoundable(ty: BinaryOpTy) -> bool {
    matches!(
        ty,
        BinaryOpTy::Plus
            | BinaryOpTy::Minus
            | BinaryOpTy::Star
            | BinaryOpTy::Slash
            | BinaryOpTy::Percent
            | BinaryOpTy::StarStar
            | BinaryOpTy::And
            | BinaryOpTy::Or
    )
}

fn binop_str(ty: BinaryOpTy) -> &'static str {
    match ty {
        BinaryOpTy::Comma => ",",
        BinaryOpTy::Or => "or",
        BinaryOpTy::And => "and",
        BinaryOpTy::EqualEqual => "==",
        BinaryOpTy::NotEqual => "!=",
        BinaryOpTy::Less => "<",
        BinaryOpTy::LessEqual => "<=",
        BinaryOpTy::Greater => ">",
        BinaryOpTy::GreaterEqual => ">=",
        BinaryOpTy::Plus => "+",
        BinaryOpTy::Minus => "-",
        BinaryOpTy::Star => "*",
        BinaryOpTy::Slash => "/",
        BinaryOpTy::Percent => "%",
        BinaryOpTy::StarStar => "**",
    }
}
