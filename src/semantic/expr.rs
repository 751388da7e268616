use super::{Context, Semantic, SemanticError, Sink};
use crate::{
    ast::{BinOp, Node, Type},
    ir::{ArithOp, Cond, Constant, Local},
    lex::Identifier,
    source::{Located, Location},
};

/// Resultado de reducir una expresión.
#[derive(Copy, Clone)]
pub(super) enum Value {
    Number(Local),

    /// Las cadenas son opacas: no se almacenan, operan ni retornan.
    Str(Local, Location),
}

impl Value {
    pub(super) fn number(self) -> Semantic<Local> {
        match self {
            Value::Number(local) => Ok(local),
            Value::Str(_, location) => Err(Located::at(SemanticError::ExpectedNumber, location)),
        }
    }
}

impl<S: Sink + ?Sized> Context<'_, S> {
    pub(super) fn expr(&mut self, node: &Node) -> Semantic<Value> {
        match node {
            Node::Number(number) => Ok(Value::Number(self.number(*number))),

            Node::Str(string) => {
                let constant = Constant::Str(string.val().as_str().into());
                Ok(Value::Str(self.sink.constant(constant), string.location()))
            }

            Node::Variable(name) => self.env.read(self.sink, name).map(Value::Number),
            Node::Grouping(inner) => self.expr(inner),

            Node::Binary { op, left, right } => {
                let left = self.expr(left)?.number()?;
                let right = self.expr(right)?.number()?;

                Ok(Value::Number(self.binary(*op.val(), left, right)))
            }

            Node::Call { callee, args } => self.call(callee, args),

            Node::Assign {
                target,
                value,
                declaration,
                of,
            } => {
                if *of == Type::String {
                    return Err(string_assignment(target));
                }

                let value = match value {
                    None => self.number(0.0),
                    Some(value) => match self.expr(value)? {
                        Value::Number(local) => local,
                        Value::Str(..) => return Err(string_assignment(target)),
                    },
                };

                if *declaration {
                    self.env.declare(self.sink, target, value)?;
                } else {
                    self.env.assign(self.sink, target, value)?;
                }

                Ok(Value::Number(value))
            }

            // Las sentencias en posición de expresión valen cero
            Node::If { .. } | Node::Return(_) => {
                self.statement(node)?;
                Ok(Value::Number(self.number(0.0)))
            }
        }
    }

    pub(super) fn number(&mut self, number: f64) -> Local {
        self.sink.constant(Constant::Number(number))
    }

    fn binary(&mut self, op: BinOp, left: Local, right: Local) -> Local {
        let cond = match op {
            BinOp::Add => return self.sink.arith(ArithOp::Add, left, right),
            BinOp::Sub => return self.sink.arith(ArithOp::Sub, left, right),
            BinOp::Mul => return self.sink.arith(ArithOp::Mul, left, right),
            BinOp::Div => return self.sink.arith(ArithOp::Div, left, right),

            BinOp::Equal => Cond::Equal,
            BinOp::NotEqual => Cond::NotEqual,
            BinOp::Less => Cond::Less,
            BinOp::LessOrEqual => Cond::LessOrEqual,
            BinOp::Greater => Cond::Greater,
            BinOp::GreaterOrEqual => Cond::GreaterOrEqual,
        };

        let flag = self.sink.compare(cond, left, right);
        self.sink.widen(flag)
    }

    fn call(&mut self, callee: &Located<Identifier>, args: &[Node]) -> Semantic<Value> {
        let signature = self
            .sink
            .lookup_function(callee.val().as_ref())
            .ok_or_else(|| {
                Located::at(
                    SemanticError::UnknownFunction(callee.val().clone()),
                    callee.location(),
                )
            })?;

        if signature.arity != args.len() {
            let error = SemanticError::ArgumentCount {
                function: callee.val().clone(),
                expected: signature.arity,
                found: args.len(),
            };

            return Err(Located::at(error, callee.location()));
        }

        let arguments = args
            .iter()
            .map(|arg| self.expr(arg)?.number())
            .collect::<Semantic<Vec<_>>>()?;

        Ok(Value::Number(self.sink.call(signature.id, arguments)))
    }
}

fn string_assignment(target: &Located<Identifier>) -> Located<SemanticError> {
    let error = SemanticError::StringAssignment(target.val().clone());
    Located::at(error, target.location())
}
