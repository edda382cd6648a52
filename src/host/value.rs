//! Host values and expressions

use std::fmt;
use std::rc::Rc;

use serde::Serialize;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Logical(bool),
    Int(i64),
    Double(f64),
    Str(String),
    Function(Rc<Function>),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "NULL",
            Value::Logical(_) => "logical",
            Value::Int(_) => "integer",
            Value::Double(_) => "double",
            Value::Str(_) => "character",
            Value::Function(_) => "closure",
        }
    }

    pub fn is_function(&self) -> bool {
        matches!(self, Value::Function(_))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Logical(true) => write!(f, "TRUE"),
            Value::Logical(false) => write!(f, "FALSE"),
            Value::Int(i) => write!(f, "{}", i),
            Value::Double(d) => write!(f, "{}", d),
            Value::Str(s) => write!(f, "{:?}", s),
            Value::Function(fun) => match &fun.name {
                Some(name) => write!(f, "<function {}>", name),
                None => write!(f, "<function>"),
            },
        }
    }
}

/// Rendered as the printed value so outcomes can be emitted as JSON.
impl Serialize for Value {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Logical(b) => serializer.serialize_bool(*b),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::Double(d) => serializer.serialize_f64(*d),
            Value::Str(s) => serializer.serialize_str(s),
            Value::Function(_) => serializer.serialize_str(&self.to_string()),
        }
    }
}

/// A zero-argument host closure.
#[derive(Debug, PartialEq)]
pub struct Function {
    pub name: Option<String>,
    pub body: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Lit(Value),
    /// `stop(message)`
    Stop(String),
    /// `cat(text)`
    Cat(String),
    /// `do.call(f, list())`
    DoCall(Box<Expr>),
    /// `.Call(routine, args...)`
    Native { routine: String, args: Vec<Expr> },
    Block(Vec<Expr>),
    /// `tryCatch(body, error = function(e) fallback)`
    TryCatch { body: Box<Expr>, fallback: Box<Expr> },
}

impl Expr {
    pub fn lit(value: Value) -> Self {
        Expr::Lit(value)
    }

    pub fn stop(message: impl Into<String>) -> Self {
        Expr::Stop(message.into())
    }

    pub fn cat(text: impl Into<String>) -> Self {
        Expr::Cat(text.into())
    }

    pub fn do_call(fun: Expr) -> Self {
        Expr::DoCall(Box::new(fun))
    }

    pub fn native(routine: impl Into<String>, args: Vec<Expr>) -> Self {
        Expr::Native {
            routine: routine.into(),
            args,
        }
    }

    pub fn block(exprs: Vec<Expr>) -> Self {
        Expr::Block(exprs)
    }

    pub fn try_catch(body: Expr, fallback: Expr) -> Self {
        Expr::TryCatch {
            body: Box::new(body),
            fallback: Box::new(fallback),
        }
    }

    /// `function() body`
    pub fn lambda(body: Expr) -> Self {
        Expr::Lit(Value::Function(Rc::new(Function { name: None, body })))
    }

    /// `name <- function() body`, as a literal carrying its name.
    pub fn function(name: impl Into<String>, body: Expr) -> Self {
        Expr::Lit(Value::Function(Rc::new(Function {
            name: Some(name.into()),
            body,
        })))
    }
}
