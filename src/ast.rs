//! Árbol de sintaxis abstracta.
//!
//! El conjunto de nodos es cerrado y pequeño, por lo cual las fases
//! posteriores recorren el árbol por medio de `match` sobre [`Node`]
//! en vez de un visitor. Cada nodo compuesto es dueño exclusivo de
//! sus hijos.

use std::fmt::{self, Display};

use crate::{lex::Identifier, source::Located};

/// Programa completo: una secuencia de declaraciones de funciones.
#[derive(Debug, Default)]
pub struct Ast(Vec<Function>);

impl Ast {
    pub fn new(functions: Vec<Function>) -> Self {
        Ast(functions)
    }

    pub fn functions(&self) -> &[Function] {
        &self.0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Function> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Declaración de una función con cuerpo.
#[derive(Debug)]
pub struct Function {
    prototype: Prototype,
    body: Vec<Node>,
}

impl Function {
    pub fn new(prototype: Prototype, body: Vec<Node>) -> Self {
        Function { prototype, body }
    }

    pub fn prototype(&self) -> &Prototype {
        &self.prototype
    }

    pub fn body(&self) -> &[Node] {
        &self.body
    }
}

/// Firma de una función: nombre y nombres de parámetros.
#[derive(Debug)]
pub struct Prototype {
    name: Located<Identifier>,
    parameters: Vec<Located<Identifier>>,
}

impl Prototype {
    pub fn new(name: Located<Identifier>, parameters: Vec<Located<Identifier>>) -> Self {
        Prototype { name, parameters }
    }

    pub fn name(&self) -> &Located<Identifier> {
        &self.name
    }

    pub fn parameters(&self) -> &[Located<Identifier>] {
        &self.parameters
    }
}

/// Tipo declarado de una variable.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Type {
    Number,
    String,
}

impl Display for Type {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Number => fmt.write_str("number"),
            Type::String => fmt.write_str("string"),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Equal,
    NotEqual,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
}

impl BinOp {
    /// Determina si el resultado de la operación es booleano.
    pub fn is_comparison(self) -> bool {
        !matches!(self, BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div)
    }
}

impl Display for BinOp {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        use BinOp::*;

        let symbol = match self {
            Add => "+",
            Sub => "-",
            Mul => "*",
            Div => "/",
            Equal => "==",
            NotEqual => "!=",
            Less => "<",
            LessOrEqual => "<=",
            Greater => ">",
            GreaterOrEqual => ">=",
        };

        fmt.write_str(symbol)
    }
}

/// Sentencias y expresiones.
#[derive(Debug)]
pub enum Node {
    Call {
        callee: Located<Identifier>,
        args: Vec<Node>,
    },

    Binary {
        op: Located<BinOp>,
        left: Box<Node>,
        right: Box<Node>,
    },

    Grouping(Box<Node>),

    Number(f64),

    Str(Located<String>),

    Variable(Located<Identifier>),

    /// Declaración (`var x = ...;`) o reasignación (`x = ...`).
    ///
    /// Solamente las declaraciones pueden omitir el valor.
    Assign {
        target: Located<Identifier>,
        value: Option<Box<Node>>,
        declaration: bool,
        of: Type,
    },

    If {
        condition: Box<Node>,
        then: Vec<Node>,
        otherwise: Vec<Node>,
    },

    Return(Box<Node>),
}

/// Etiqueta de variante de [`Node`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum NodeKind {
    Call,
    Binary,
    Grouping,
    Number,
    Str,
    Variable,
    Assign,
    If,
    Return,
}

impl Node {
    pub fn kind(&self) -> NodeKind {
        match self {
            Node::Call { .. } => NodeKind::Call,
            Node::Binary { .. } => NodeKind::Binary,
            Node::Grouping(_) => NodeKind::Grouping,
            Node::Number(_) => NodeKind::Number,
            Node::Str(_) => NodeKind::Str,
            Node::Variable(_) => NodeKind::Variable,
            Node::Assign { .. } => NodeKind::Assign,
            Node::If { .. } => NodeKind::If,
            Node::Return(_) => NodeKind::Return,
        }
    }
}

impl Display for Ast {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        for function in self.iter() {
            writeln!(fmt, "{}", function)?;
        }

        Ok(())
    }
}

impl Display for Function {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(fmt, "(fun {}", self.prototype.name.val())?;

        fmt.write_str(" (")?;
        write_separated(fmt, self.prototype.parameters.iter().map(Located::val))?;
        fmt.write_str(")")?;

        for node in &self.body {
            write!(fmt, " {}", node)?;
        }

        fmt.write_str(")")
    }
}

impl Display for Node {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Call { callee, args } => {
                write!(fmt, "(call {}", callee.val())?;
                for arg in args {
                    write!(fmt, " {}", arg)?;
                }

                fmt.write_str(")")
            }

            Node::Binary { op, left, right } => {
                write!(fmt, "({} {} {})", op.val(), left, right)
            }

            Node::Grouping(inner) => write!(fmt, "(group {})", inner),
            Node::Number(number) => write!(fmt, "{}", number),
            Node::Str(string) => write!(fmt, "{:?}", string.val()),
            Node::Variable(variable) => write!(fmt, "{}", variable.val()),

            Node::Assign {
                target,
                value,
                declaration,
                of,
            } => {
                let head = if *declaration { "var" } else { "set" };
                write!(fmt, "({} {}: {}", head, target.val(), of)?;

                if let Some(value) = value {
                    write!(fmt, " {}", value)?;
                }

                fmt.write_str(")")
            }

            Node::If {
                condition,
                then,
                otherwise,
            } => {
                write!(fmt, "(if {} (", condition)?;
                write_separated(fmt, then.iter())?;
                fmt.write_str(") (")?;
                write_separated(fmt, otherwise.iter())?;
                fmt.write_str("))")
            }

            Node::Return(value) => write!(fmt, "(return {})", value),
        }
    }
}

fn write_separated<T, I>(fmt: &mut fmt::Formatter<'_>, items: I) -> fmt::Result
where
    T: Display,
    I: Iterator<Item = T>,
{
    for (index, item) in items.enumerate() {
        if index > 0 {
            fmt.write_str(" ")?;
        }

        write!(fmt, "{}", item)?;
    }

    Ok(())
}
