use std::fmt;
use std::rc::Rc;

use crate::scanner::Token;

#[derive(Debug, Clone)]
pub enum Expr {
    Literal(Literal),
    Unary(UnaryOp, Box<Expr>),
    Binary(Box<Expr>, BinaryOp, Box<Expr>),
    Ternary {
        condition: Box<Expr>,
        question: Token,
        then_branch: Box<Expr>,
        else_branch: Box<Expr>,
    },
    Call(Box<Expr>, /*left paren*/ Token, Vec<Expr>),
    Get(Box<Expr>, Token),
    Set(Box<Expr>, Token, Box<Expr>),
    Grouping(Box<Expr>),
    Variable(Token),
    Assign(Token, Box<Expr>),
    Lambda(Rc<FunDecl>),
    Super(SuperRef),
    /// Evaluates to the inner value, failing unless it is a number. Produced
    /// by `++x` / `--x`; the token is the original `++` or `--`.
    TypeCheck(Box<Expr>, Token),
}

#[derive(Debug, Clone)]
pub struct SuperRef {
    pub keyword: Token,
    /// `super(Base).m` names its superclass explicitly.
    pub class: Option<Token>,
    pub method: Token,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum FunctionKind {
    Function,
    Method,
    ClassMethod,
    Lambda,
}

impl fmt::Display for FunctionKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FunctionKind::Function => write!(f, "function"),
            FunctionKind::Method => write!(f, "method"),
            FunctionKind::ClassMethod => write!(f, "class method"),
            FunctionKind::Lambda => write!(f, "lambda"),
        }
    }
}

#[derive(Debug, Clone)]
pub enum FunBody {
    Block(Vec<Stmt>),
    /// Lambda-style body: the value of the expression is returned.
    Expr(Expr),
}

/// A function, method or lambda. Lambdas use their `fun` keyword as name.
#[derive(Debug, Clone)]
pub struct FunDecl {
    pub name: Token,
    pub params: Vec<Token>,
    pub body: FunBody,
    pub kind: FunctionKind,
    pub is_property: bool,
}

#[derive(Debug, Clone)]
pub struct ClassDecl {
    pub name: Token,
    pub superclasses: Vec<Token>,
    pub methods: Vec<Rc<FunDecl>>,
    pub class_methods: Vec<Rc<FunDecl>>,
    /// Declaring token of the `self` binding shared by every method.
    pub self_token: Token,
}

#[derive(Debug, Clone)]
pub enum Stmt {
    Expr(Expr),
    Print(Expr),
    /// Trailing expression of a block or program written without `;`; its
    /// value is printed.
    Last(Expr),
    VarDecl(Token, Option<Expr>),
    FunDecl(Rc<FunDecl>),
    ClassDecl(Rc<ClassDecl>),
    Block(Vec<Stmt>),
    If(Expr, Box<Stmt>, Option<Box<Stmt>>),
    While(/*keyword*/ Token, Expr, Box<Stmt>),
    ContinueCatcher(Box<Stmt>),
    /// Body of a desugared `for`: the updater runs after the body even when
    /// the body ends with `continue`.
    ForBlock(Box<Stmt>, Box<Stmt>),
    Return(Token, Option<Expr>),
    Break(Token),
    Continue(Token),
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum UnaryOpTy {
    Minus,
    Bang,
}

#[derive(Debug, Clone)]
pub struct UnaryOp {
    pub ty: UnaryOpTy,
    pub token: Token,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum BinaryOpTy {
    Comma,
    Or,
    And,
    EqualEqual,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    StarStar,
}

#[derive(Debug, Clone)]
pub struct BinaryOp {
    pub ty: BinaryOpTy,
    pub token: Token,
}

#[derive(Debug, Clone)]
pub enum Literal {
    Number(f64),
    String(String),
    True,
    False,
    Nil,
}
