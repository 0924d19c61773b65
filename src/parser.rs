use std::rc::Rc;

use crate::diagnostics::Diagnostics;
use crate::expr;
use crate::expr::FunctionKind;
use crate::scanner::{self, Token, TokenType};

static MAX_ARGS: usize = 255;

struct Parser<'d> {
    tokens: Vec<Token>,
    current: usize,
    loop_depth: usize,
    continues: Vec<bool>,
    diagnostics: &'d mut Diagnostics,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{message}")]
    TokenMismatch {
        expected: TokenType,
        found: Token,
        message: String,
    },
    #[error("Expect expression.")]
    ExpectedExpression { found: Token },
    #[error("Expect first operand (expression) before operator.")]
    MissingFirstOperand { operator: Token },
    #[error("Invalid assignment target (variable or field expected).")]
    InvalidAssignment { equals: Token },
    #[error("Invalid increment/decrement target.")]
    InvalidIncrement { operator: Token },
    #[error("Can't have more than 255 parameters in a {kind}.")]
    MaxParamsExceeded { kind: FunctionKind, found: Token },
    #[error("Can't have more than 255 arguments.")]
    TooManyArguments { found: Token },
    #[error("'{}' outside of a loop.", .keyword.lexeme)]
    OutsideLoop { keyword: Token },
    #[error("Invalid token in unary operation.")]
    InvalidTokenInUnaryOp { token: Token },
    #[error("Invalid token in binary operation.")]
    InvalidTokenInBinaryOp { token: Token },
}

impl Error {
    pub fn token(&self) -> &Token {
        match self {
            Error::TokenMismatch { found, .. } => found,
            Error::ExpectedExpression { found } => found,
            Error::MissingFirstOperand { operator } => operator,
            Error::InvalidAssignment { equals } => equals,
            Error::InvalidIncrement { operator } => operator,
            Error::MaxParamsExceeded { found, .. } => found,
            Error::TooManyArguments { found } => found,
            Error::OutsideLoop { keyword } => keyword,
            Error::InvalidTokenInUnaryOp { token } => token,
            Error::InvalidTokenInBinaryOp { token } => token,
        }
    }
}

/// Parses a whole program. Syntax errors go to `diagnostics`; the statement
/// holding an error is dropped and parsing resumes at the next statement.
pub fn parse(mut tokens: Vec<Token>, diagnostics: &mut Diagnostics) -> Vec<expr::Stmt> {
    let needs_eof = tokens.last().map_or(true, |tok| tok.ty != TokenType::Eof);
    if needs_eof {
        let line = tokens.last().map_or(1, |tok| tok.line);
        tokens.push(Token::new(TokenType::Eof, "", None, line, -1));
    }

    let mut p = Parser {
        tokens,
        current: 0,
        loop_depth: 0,
        continues: Vec::new(),
        diagnostics,
    };
    let stmts = p.parse();
    tracing::debug!(count = stmts.len(), "parsed statements");
    stmts
}

/*
Recursive descent using the following grammar

program     → declaration* EOF ;

declaration → classDecl
            | funDecl
            | varDecl
            | statement ;

classDecl   → "class" IDENTIFIER ( "<" IDENTIFIER ( "," IDENTIFIER )* )?
              "{" ( "class"? function )* "}" ;

funDecl     → "fun" function ;
function    → IDENTIFIER ( "(" parameters? ")" | ":" ) funBody ;
funBody     → block | expression ";" ;
parameters  → IDENTIFIER ( "," IDENTIFIER )* ;

statement   → exprStmt
            | forStmt
            | ifStmt
            | printStmt
            | returnStmt
            | whileStmt
            | ( "break" | "continue" ) ";"
            | ";"
            | block ;

forStmt     → "for" "(" ( varDecl | exprStmt | ";" )
                        expression? ";"
                        expression? ")" statement ;

exprStmt    → expression ";"
            | expression ;          (last statement of a block or program)

expression  → comma ;
comma       → assignment ( "," assignment )* ;
assignment  → ( call "." )? IDENTIFIER ( "=" | COMPOUND_EQUAL ) assignment
            | lambda ;
lambda      → "fun" "(" parameters? ")" ( block | lambda )
            | ternary ;
ternary     → logic_or ( "?" logic_or ":" ternary )? ;
logic_or    → logic_and ( "or" logic_and )* ;
logic_and   → equality ( "and" equality )* ;
equality    → comparison ( ( "!=" | "==" ) comparison )* ;
comparison  → term ( ( ">" | ">=" | "<" | "<=" ) term )* ;
term        → factor ( ( "-" | "+" ) factor )* ;
factor      → exponent ( ( "/" | "*" | "%" ) exponent )* ;
exponent    → unary ( "**" exponent )? ;
unary       → ( "!" | "-" | "++" | "--" ) unary | call ;
call        → primary ( "(" arguments? ")" | "." IDENTIFIER )* ;
arguments   → assignment ( "," assignment )* ;

primary     → "true" | "false" | "nil" | "self"
            | NUMBER | STRING | IDENTIFIER | "(" expression ")"
            | "super" ( "(" IDENTIFIER ")" )? "." IDENTIFIER ;

*/
impl<'d> Parser<'d> {
    fn parse(&mut self) -> Vec<expr::Stmt> {
        let mut statements = Vec::new();

        while !self.is_at_end() {
            if let Some(stmt) = self.declaration() {
                statements.push(stmt);
            }
        }

        statements
    }

    fn declaration(&mut self) -> Option<expr::Stmt> {
        match self.declaration_or_statement() {
            Ok(stmt) => stmt,
            Err(err) => {
                self.report(&err);
                self.synchronize();
                None
            }
        }
    }

    fn declaration_or_statement(&mut self) -> Result<Option<expr::Stmt>, Error> {
        if self.matches(TokenType::Class) {
            return Ok(Some(self.class_decl()?));
        }

        if self.check(TokenType::Fun) && self.check_next(TokenType::Identifier) {
            self.advance();
            return Ok(Some(expr::Stmt::FunDecl(
                self.fun_decl(FunctionKind::Function)?,
            )));
        }

        if self.matches(TokenType::Var) {
            return Ok(Some(self.var_decl()?));
        }

        self.statement()
    }

    fn class_decl(&mut self) -> Result<expr::Stmt, Error> {
        let name = self
            .consume(TokenType::Identifier, "Expect class name.")?
            .clone();

        let mut superclasses = Vec::new();
        if self.matches(TokenType::Less) {
            loop {
                let superclass = self
                    .consume(
                        TokenType::Identifier,
                        "Expect superclass name after '<' or ','.",
                    )?
                    .clone();
                superclasses.push(superclass);

                if !self.matches(TokenType::Comma) {
                    break;
                }
            }
        }

        self.consume(TokenType::LeftBrace, "Expect '{' before class body.")?;

        let mut methods = Vec::new();
        let mut class_methods = Vec::new();
        while !self.check(TokenType::RightBrace) && !self.is_at_end() {
            let kind = if self.matches(TokenType::Class) {
                FunctionKind::ClassMethod
            } else {
                FunctionKind::Method
            };

            match self.fun_decl(kind) {
                Ok(method) if kind == FunctionKind::ClassMethod => class_methods.push(method),
                Ok(method) => methods.push(method),
                Err(err) => {
                    self.report(&err);
                    self.synchronize();
                }
            }
        }

        self.consume(TokenType::RightBrace, "Expect '}' after class body.")?;

        Ok(expr::Stmt::ClassDecl(Rc::new(expr::ClassDecl {
            name,
            superclasses,
            methods,
            class_methods,
            self_token: Token::special("self"),
        })))
    }

    fn fun_decl(&mut self, kind: FunctionKind) -> Result<Rc<expr::FunDecl>, Error> {
        let name = self
            .consume(TokenType::Identifier, &format!("Expect {} name.", kind))?
            .clone();

        let (params, is_property) = if self.matches(TokenType::Colon) {
            (Vec::new(), true)
        } else {
            (self.parameters(kind)?, false)
        };

        let body = self.function_body(false)?;

        Ok(Rc::new(expr::FunDecl {
            name,
            params,
            body,
            kind,
            is_property,
        }))
    }

    fn parameters(&mut self, kind: FunctionKind) -> Result<Vec<Token>, Error> {
        self.consume(
            TokenType::LeftParen,
            &format!("Expect '(' to introduce {} parameters.", kind),
        )?;

        let mut parameters = Vec::new();

        if !self.check(TokenType::RightParen) {
            loop {
                if parameters.len() >= MAX_ARGS {
                    let found = self.peek().clone();
                    self.report(&Error::MaxParamsExceeded { kind, found });
                }

                let tok = self
                    .consume(TokenType::Identifier, "Expect parameter name.")?
                    .clone();
                parameters.push(tok);

                if !self.matches(TokenType::Comma) {
                    break;
                }
            }
        }

        self.consume(TokenType::RightParen, "Expect ')' after parameters.")?;

        Ok(parameters)
    }

    /// Loop nesting does not reach into a function body: `break` inside a
    /// function nested in a loop is still outside of a loop.
    fn function_body(&mut self, is_lambda: bool) -> Result<expr::FunBody, Error> {
        let saved_loop_depth = std::mem::replace(&mut self.loop_depth, 0);
        let saved_continues = std::mem::take(&mut self.continues);

        let body = self.function_body_inner(is_lambda);

        self.loop_depth = saved_loop_depth;
        self.continues = saved_continues;

        body
    }

    fn function_body_inner(&mut self, is_lambda: bool) -> Result<expr::FunBody, Error> {
        if self.matches(TokenType::LeftBrace) {
            return Ok(expr::FunBody::Block(self.block()?));
        }

        if is_lambda {
            return Ok(expr::FunBody::Expr(self.lambda()?));
        }

        let expr = self.expression()?;
        if !self.is_at_end() && !self.check(TokenType::RightBrace) {
            self.semicolon()?;
        }
        Ok(expr::FunBody::Expr(expr))
    }

    fn var_decl(&mut self) -> Result<expr::Stmt, Error> {
        let name_token = self
            .consume(TokenType::Identifier, "Expect variable name.")?
            .clone();

        let maybe_initializer = if self.matches(TokenType::Equal) {
            Some(self.expression()?)
        } else {
            None
        };

        self.semicolon()?;

        Ok(expr::Stmt::VarDecl(name_token, maybe_initializer))
    }

    fn statement(&mut self) -> Result<Option<expr::Stmt>, Error> {
        if self.match_one_of(&[TokenType::Break, TokenType::Continue]) {
            return self.keyword_statement();
        }

        if self.matches(TokenType::For) {
            return self.for_statement().map(Some);
        }

        if self.matches(TokenType::If) {
            return self.if_statement().map(Some);
        }

        if self.matches(TokenType::LeftBrace) {
            return Ok(Some(expr::Stmt::Block(self.block()?)));
        }

        if self.matches(TokenType::Print) {
            return self.print_statement().map(Some);
        }

        if self.matches(TokenType::Return) {
            return self.return_statement().map(Some);
        }

        if self.matches(TokenType::Semicolon) {
            return Ok(None);
        }

        if self.matches(TokenType::While) {
            return self.while_statement().map(Some);
        }

        self.expression_statement().map(Some)
    }

    /// A statement in a position that requires one (branch or loop body); a
    /// lone `;` becomes an empty block.
    fn nested_statement(&mut self) -> Result<expr::Stmt, Error> {
        Ok(self
            .statement()?
            .unwrap_or_else(|| expr::Stmt::Block(Vec::new())))
    }

    fn keyword_statement(&mut self) -> Result<Option<expr::Stmt>, Error> {
        let keyword = self.previous().clone();
        self.semicolon()?;

        if self.loop_depth == 0 {
            self.report(&Error::OutsideLoop { keyword });
            return Ok(None);
        }

        if keyword.ty == TokenType::Continue {
            if let Some(innermost) = self.continues.last_mut() {
                *innermost = true;
            }
            return Ok(Some(expr::Stmt::Continue(keyword)));
        }

        Ok(Some(expr::Stmt::Break(keyword)))
    }

    fn return_statement(&mut self) -> Result<expr::Stmt, Error> {
        let keyword = self.previous().clone();

        let maybe_retval = if self.check(TokenType::Semicolon) {
            None
        } else {
            Some(self.expression()?)
        };

        self.semicolon()?;

        Ok(expr::Stmt::Return(keyword, maybe_retval))
    }

    fn for_statement(&mut self) -> Result<expr::Stmt, Error> {
        let keyword = self.previous().clone();
        self.consume(TokenType::LeftParen, "Expect '(' after 'for'.")?;

        let maybe_initializer = if self.matches(TokenType::Semicolon) {
            None
        } else if self.matches(TokenType::Var) {
            Some(self.var_decl()?)
        } else {
            let initializer = self.expression()?;
            self.semicolon()?;
            Some(expr::Stmt::Expr(initializer))
        };

        let maybe_condition = if !self.check(TokenType::Semicolon) {
            Some(self.expression()?)
        } else {
            None
        };

        self.consume(TokenType::Semicolon, "Expect ';' after loop condition.")?;

        let maybe_updater = if !self.check(TokenType::RightParen) {
            Some(self.expression()?)
        } else {
            None
        };

        self.consume(TokenType::RightParen, "Expect ')' after for clauses.")?;

        let maybe_body = self.loop_body()?;

        // for (init; cond; updater) body  ==>  { init; while (cond) { body; updater; } }
        let body = match (maybe_body, maybe_updater) {
            (body, None) => body.unwrap_or_else(|| expr::Stmt::Block(Vec::new())),
            (None, Some(updater)) => expr::Stmt::Expr(updater),
            (Some(body), Some(updater)) => {
                expr::Stmt::ForBlock(Box::new(body), Box::new(expr::Stmt::Expr(updater)))
            }
        };

        let condition = match maybe_condition {
            Some(cond) => cond,
            None => expr::Expr::Literal(expr::Literal::True),
        };
        let mut res = expr::Stmt::While(keyword, condition, Box::new(body));

        if let Some(initializer) = maybe_initializer {
            res = expr::Stmt::Block(vec![initializer, res])
        }

        Ok(res)
    }

    fn while_statement(&mut self) -> Result<expr::Stmt, Error> {
        let keyword = self.previous().clone();
        self.consume(TokenType::LeftParen, "Expect '(' after 'while'.")?;
        let cond = self.expression()?;
        self.consume(TokenType::RightParen, "Expect ')' after condition.")?;
        let body = self
            .loop_body()?
            .unwrap_or_else(|| expr::Stmt::Block(Vec::new()));
        Ok(expr::Stmt::While(keyword, cond, Box::new(body)))
    }

    fn loop_body(&mut self) -> Result<Option<expr::Stmt>, Error> {
        self.loop_depth += 1;
        self.continues.push(false);

        let body = self.statement();

        let has_continue = self.continues.pop().unwrap_or(false);
        self.loop_depth -= 1;

        Ok(body?.map(|body| {
            if has_continue {
                expr::Stmt::ContinueCatcher(Box::new(body))
            } else {
                body
            }
        }))
    }

    fn if_statement(&mut self) -> Result<expr::Stmt, Error> {
        self.consume(TokenType::LeftParen, "Expect '(' after 'if'.")?;
        let cond = self.expression()?;
        self.consume(TokenType::RightParen, "Expect ')' after condition.")?;
        let then_branch = Box::new(self.nested_statement()?);
        let maybe_else_branch = if self.matches(TokenType::Else) {
            Some(Box::new(self.nested_statement()?))
        } else {
            None
        };

        Ok(expr::Stmt::If(cond, then_branch, maybe_else_branch))
    }

    fn block(&mut self) -> Result<Vec<expr::Stmt>, Error> {
        let mut stmts = Vec::new();

        while !self.check(TokenType::RightBrace) && !self.is_at_end() {
            if let Some(stmt) = self.declaration() {
                stmts.push(stmt)
            }
        }

        self.consume(TokenType::RightBrace, "Expect '}' after block.")?;

        Ok(stmts)
    }

    fn print_statement(&mut self) -> Result<expr::Stmt, Error> {
        let expr = self.expression()?;
        self.semicolon()?;
        Ok(expr::Stmt::Print(expr))
    }

    fn expression_statement(&mut self) -> Result<expr::Stmt, Error> {
        let expr = self.expression()?;
        if self.is_at_end() || self.check(TokenType::RightBrace) {
            return Ok(expr::Stmt::Last(expr));
        }
        self.semicolon()?;
        Ok(expr::Stmt::Expr(expr))
    }

    fn semicolon(&mut self) -> Result<(), Error> {
        self.consume(TokenType::Semicolon, "Expect ';' at end of statement.")?;
        Ok(())
    }

    fn expression(&mut self) -> Result<expr::Expr, Error> {
        self.comma()
    }

    fn comma(&mut self) -> Result<expr::Expr, Error> {
        self.left_assoc(Parser::assignment, &[TokenType::Comma])
    }

    fn assignment(&mut self) -> Result<expr::Expr, Error> {
        let expr = self.lambda()?;

        if self.matches(TokenType::Equal) {
            let equals = self.previous().clone();
            let value = self.assignment()?;
            return Ok(self.finish_assignment(expr, &equals, value));
        }

        if self.matches(TokenType::CompoundEqual) {
            let compound = self.previous().clone();
            let (operator, equals) = match compound.compound_parts() {
                Some((operator, equals)) => (operator.clone(), equals.clone()),
                None => return Err(Error::InvalidTokenInBinaryOp { token: compound }),
            };
            let binop = Parser::op_token_to_binop(&operator)?;
            let right = self.assignment()?;
            // a op= b  ==>  a = a op b
            let value = expr::Expr::Binary(Box::new(expr.clone()), binop, Box::new(right));
            return Ok(self.finish_assignment(expr, &equals, value));
        }

        Ok(expr)
    }

    fn finish_assignment(
        &mut self,
        target: expr::Expr,
        equals: &Token,
        value: expr::Expr,
    ) -> expr::Expr {
        match target {
            expr::Expr::Variable(name) => expr::Expr::Assign(name, Box::new(value)),
            expr::Expr::Get(object, name) => expr::Expr::Set(object, name, Box::new(value)),
            target => {
                self.report(&Error::InvalidAssignment {
                    equals: equals.clone(),
                });
                target
            }
        }
    }

    fn lambda(&mut self) -> Result<expr::Expr, Error> {
        if self.matches(TokenType::Fun) {
            let keyword = self.previous().clone();
            let params = self.parameters(FunctionKind::Lambda)?;
            let body = self.function_body(true)?;
            return Ok(expr::Expr::Lambda(Rc::new(expr::FunDecl {
                name: keyword,
                params,
                body,
                kind: FunctionKind::Lambda,
                is_property: false,
            })));
        }

        self.ternary()
    }

    fn ternary(&mut self) -> Result<expr::Expr, Error> {
        let expr = self.or()?;

        if self.matches(TokenType::Question) {
            let question = self.previous().clone();
            let then_branch = self.or()?;
            self.consume(TokenType::Colon, "Expect ':' in ternary.")?;
            let else_branch = self.ternary()?;
            return Ok(expr::Expr::Ternary {
                condition: Box::new(expr),
                question,
                then_branch: Box::new(then_branch),
                else_branch: Box::new(else_branch),
            });
        }

        Ok(expr)
    }

    fn or(&mut self) -> Result<expr::Expr, Error> {
        self.left_assoc(Parser::and, &[TokenType::Or])
    }

    fn and(&mut self) -> Result<expr::Expr, Error> {
        self.left_assoc(Parser::equality, &[TokenType::And])
    }

    fn equality(&mut self) -> Result<expr::Expr, Error> {
        self.left_assoc(
            Parser::comparison,
            &[TokenType::BangEqual, TokenType::EqualEqual],
        )
    }

    fn comparison(&mut self) -> Result<expr::Expr, Error> {
        self.left_assoc(
            Parser::term,
            &[
                TokenType::Greater,
                TokenType::GreaterEqual,
                TokenType::Less,
                TokenType::LessEqual,
            ],
        )
    }

    fn term(&mut self) -> Result<expr::Expr, Error> {
        self.left_assoc(Parser::factor, &[TokenType::Minus, TokenType::Plus])
    }

    fn factor(&mut self) -> Result<expr::Expr, Error> {
        self.left_assoc(
            Parser::exponent,
            &[TokenType::Slash, TokenType::Star, TokenType::Percent],
        )
    }

    fn exponent(&mut self) -> Result<expr::Expr, Error> {
        let expr = self.unary()?;

        if self.matches(TokenType::StarStar) {
            let operator_token = self.previous().clone();
            let binop = Parser::op_token_to_binop(&operator_token)?;
            let right = self.exponent()?;
            return Ok(expr::Expr::Binary(Box::new(expr), binop, Box::new(right)));
        }

        Ok(expr)
    }

    fn left_assoc(
        &mut self,
        operand: fn(&mut Parser<'d>) -> Result<expr::Expr, Error>,
        operators: &[TokenType],
    ) -> Result<expr::Expr, Error> {
        let mut expr = operand(self)?;

        while self.match_one_of(operators) {
            let operator_token = self.previous().clone();
            let binop = Parser::op_token_to_binop(&operator_token)?;
            let right = operand(self)?;
            expr = expr::Expr::Binary(Box::new(expr), binop, Box::new(right));
        }

        Ok(expr)
    }

    fn unary(&mut self) -> Result<expr::Expr, Error> {
        if self.match_one_of(&[TokenType::Bang, TokenType::Minus]) {
            let operator_token = self.previous().clone();
            let right = Box::new(self.unary()?);
            let unary_op = Parser::op_token_to_unary_op(&operator_token)?;
            return Ok(expr::Expr::Unary(unary_op, right));
        }

        // ++x  ==>  x = TypeCheck(x) + 1
        if self.match_one_of(&[TokenType::PlusPlus, TokenType::MinusMinus]) {
            let operator = self.previous().clone();
            let target = self.unary()?;

            let (ty, token_type, lexeme) = if operator.ty == TokenType::PlusPlus {
                (expr::BinaryOpTy::Plus, TokenType::Plus, "+")
            } else {
                (expr::BinaryOpTy::Minus, TokenType::Minus, "-")
            };
            let binop = expr::BinaryOp {
                ty,
                token: Token::new(token_type, lexeme, None, operator.line, operator.col),
            };
            let value = expr::Expr::Binary(
                Box::new(expr::Expr::TypeCheck(
                    Box::new(target.clone()),
                    operator.clone(),
                )),
                binop,
                Box::new(expr::Expr::Literal(expr::Literal::Number(1.0))),
            );

            return Ok(match target {
                expr::Expr::Variable(name) => expr::Expr::Assign(name, Box::new(value)),
                expr::Expr::Get(object, name) => {
                    expr::Expr::Set(object, name, Box::new(value))
                }
                target => {
                    self.report(&Error::InvalidIncrement { operator });
                    target
                }
            });
        }

        self.call()
    }

    fn call(&mut self) -> Result<expr::Expr, Error> {
        let mut expr = self.primary_or_error()?;

        loop {
            if self.matches(TokenType::LeftParen) {
                expr = self.finish_call(expr)?;
            } else if self.matches(TokenType::Dot) {
                let name_tok = self
                    .consume(TokenType::Identifier, "Expect property name after '.'.")?
                    .clone();
                expr = expr::Expr::Get(Box::new(expr), name_tok);
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn finish_call(&mut self, callee: expr::Expr) -> Result<expr::Expr, Error> {
        let paren = self.previous().clone();
        let mut arguments = Vec::new();

        if !self.check(TokenType::RightParen) {
            loop {
                if arguments.len() >= MAX_ARGS {
                    let found = self.peek().clone();
                    self.report(&Error::TooManyArguments { found });
                }
                // assignment level: a ',' here separates arguments
                arguments.push(self.assignment()?);
                if !self.matches(TokenType::Comma) {
                    break;
                }
            }
        }

        self.consume(TokenType::RightParen, "Expect ')' after arguments.")?;

        Ok(expr::Expr::Call(Box::new(callee), paren, arguments))
    }

    /// Error production: a binary operator with no left operand. The error
    /// is reported, a placeholder operand is inserted and parsing goes on.
    fn primary_or_error(&mut self) -> Result<expr::Expr, Error> {
        let missing_operand = matches!(
            self.peek().ty,
            TokenType::Question
                | TokenType::BangEqual
                | TokenType::Equal
                | TokenType::EqualEqual
                | TokenType::Greater
                | TokenType::GreaterEqual
                | TokenType::Less
                | TokenType::LessEqual
                | TokenType::Plus
                | TokenType::Percent
                | TokenType::Slash
                | TokenType::Star
        );

        if missing_operand {
            let operator = self.peek().clone();
            self.report(&Error::MissingFirstOperand {
                operator: operator.clone(),
            });
            self.tokens.insert(
                self.current,
                Token::new(
                    TokenType::Error,
                    &operator.lexeme,
                    None,
                    operator.line,
                    operator.col,
                ),
            );
            return self.assignment();
        }

        self.primary()
    }

    fn primary(&mut self) -> Result<expr::Expr, Error> {
        if self.matches(TokenType::False) {
            return Ok(expr::Expr::Literal(expr::Literal::False));
        }
        if self.matches(TokenType::True) {
            return Ok(expr::Expr::Literal(expr::Literal::True));
        }
        if self.matches(TokenType::Nil) {
            return Ok(expr::Expr::Literal(expr::Literal::Nil));
        }
        if self.matches(TokenType::SelfKw) {
            return Ok(expr::Expr::Variable(self.previous().clone()));
        }
        if self.matches(TokenType::Error) {
            return Ok(expr::Expr::Literal(expr::Literal::String("#Error".into())));
        }
        if self.matches(TokenType::Number) {
            if let Some(scanner::Literal::Number(n)) = &self.previous().literal {
                return Ok(expr::Expr::Literal(expr::Literal::Number(*n)));
            }
        }
        if self.matches(TokenType::String) {
            if let Some(scanner::Literal::Str(s)) = &self.previous().literal {
                return Ok(expr::Expr::Literal(expr::Literal::String(s.clone())));
            }
        }
        if self.matches(TokenType::Identifier) {
            return Ok(expr::Expr::Variable(self.previous().clone()));
        }
        if self.matches(TokenType::Super) {
            return self.super_expr();
        }
        if self.matches(TokenType::LeftParen) {
            let expr = Box::new(self.expression()?);
            self.consume(TokenType::RightParen, "Expect ')' after expression.")?;
            return Ok(expr::Expr::Grouping(expr));
        }

        Err(Error::ExpectedExpression {
            found: self.peek().clone(),
        })
    }

    fn super_expr(&mut self) -> Result<expr::Expr, Error> {
        let keyword = self.previous().clone();

        let class = if self.matches(TokenType::LeftParen) {
            let class = self
                .consume(TokenType::Identifier, "Expect superclass name.")?
                .clone();
            self.consume(TokenType::RightParen, "Expect ')' after superclass name.")?;
            Some(class)
        } else {
            None
        };

        self.consume(TokenType::Dot, "Expect '.' after 'super'.")?;
        let method = self
            .consume(TokenType::Identifier, "Expect superclass method name.")?
            .clone();

        Ok(expr::Expr::Super(expr::SuperRef {
            keyword,
            class,
            method,
        }))
    }

    fn consume(&mut self, tok: TokenType, on_err_str: &str) -> Result<&Token, Error> {
        if self.check(tok) {
            return Ok(self.advance());
        }
        Err(Error::TokenMismatch {
            expected: tok,
            found: self.peek().clone(),
            message: on_err_str.into(),
        })
    }

    fn report(&mut self, err: &Error) {
        self.diagnostics.error_at_token(err.token(), &err.to_string());
    }

    fn synchronize(&mut self) {
        self.advance();

        while !self.is_at_end() {
            // restart after these
            if matches!(
                self.previous().ty,
                TokenType::Semicolon | TokenType::RightBrace
            ) {
                return;
            }

            // restart at these
            match self.peek().ty {
                TokenType::Class
                | TokenType::For
                | TokenType::Fun
                | TokenType::If
                | TokenType::LeftBrace
                | TokenType::Print
                | TokenType::Return
                | TokenType::Var
                | TokenType::While
                | TokenType::Break
                | TokenType::Continue => return,
                _ => {}
            }

            self.advance();
        }
    }

    fn op_token_to_unary_op(tok: &Token) -> Result<expr::UnaryOp, Error> {
        let ty = match tok.ty {
            TokenType::Minus => expr::UnaryOpTy::Minus,
            TokenType::Bang => expr::UnaryOpTy::Bang,
            _ => return Err(Error::InvalidTokenInUnaryOp { token: tok.clone() }),
        };
        Ok(expr::UnaryOp {
            ty,
            token: tok.clone(),
        })
    }

    fn op_token_to_binop(tok: &Token) -> Result<expr::BinaryOp, Error> {
        let ty = match tok.ty {
            TokenType::Comma => expr::BinaryOpTy::Comma,
            TokenType::Or => expr::BinaryOpTy::Or,
            TokenType::And => expr::BinaryOpTy::And,
            TokenType::EqualEqual => expr::BinaryOpTy::EqualEqual,
            TokenType::BangEqual => expr::BinaryOpTy::NotEqual,
            TokenType::Less => expr::BinaryOpTy::Less,
            TokenType::LessEqual => expr::BinaryOpTy::LessEqual,
            TokenType::Greater => expr::BinaryOpTy::Greater,
            TokenType::GreaterEqual => expr::BinaryOpTy::GreaterEqual,
            TokenType::Plus => expr::BinaryOpTy::Plus,
            TokenType::Minus => expr::BinaryOpTy::Minus,
            TokenType::Star => expr::BinaryOpTy::Star,
            TokenType::Slash => expr::BinaryOpTy::Slash,
            TokenType::Percent => expr::BinaryOpTy::Percent,
            TokenType::StarStar => expr::BinaryOpTy::StarStar,
            _ => return Err(Error::InvalidTokenInBinaryOp { token: tok.clone() }),
        };
        Ok(expr::BinaryOp {
            ty,
            token: tok.clone(),
        })
    }

    fn match_one_of(&mut self, types: &[TokenType]) -> bool {
        for ty in types.iter() {
            if self.matches(*ty) {
                return true;
            }
        }
        false
    }

    fn matches(&mut self, ty: TokenType) -> bool {
        if self.check(ty) {
            self.advance();
            return true;
        }
        false
    }

    fn check(&self, ty: TokenType) -> bool {
        if self.is_at_end() {
            return false;
        }

        self.peek().ty == ty
    }

    fn check_next(&self, ty: TokenType) -> bool {
        self.tokens
            .get(self.current + 1)
            .map_or(false, |tok| tok.ty == ty)
    }

    fn advance(&mut self) -> &Token {
        if !self.is_at_end() {
            self.current += 1
        }

        self.previous()
    }

    fn is_at_end(&self) -> bool {
        self.peek().ty == TokenType::Eof
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.current]
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.current.saturating_sub(1)]
    }
}
