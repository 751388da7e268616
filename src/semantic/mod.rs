//! Análisis semántico y generación de representación intermedia.
//!
//! Cada declaración de función se reduce de manera independiente: un
//! error en una función la remueve del módulo de salida pero no impide
//! reducir las siguientes. Toda emisión de código ocurre por medio de
//! un [`Sink`], del cual [`crate::ir::Module`] es la implementación de
//! referencia.

use log::{debug, warn};
use thiserror::Error;

use crate::{
    ast::{self, Ast},
    ir::{ArithOp, Cond, Constant, FunctionId, Label, Local, Signature, Slot, VerifyError},
    lex::Identifier,
    source::Located,
};

mod expr;
mod scope;
mod stmt;

pub use scope::Environment;

/// Nombre del bloque al cual convergen todos los retornos.
pub const EXIT: &str = "exit";

/// Capacidades de emisión que la reducción requiere de un backend.
///
/// Las operaciones de emisión agregan código en el punto de inserción
/// establecido por [`Sink::position_at`], el cual debe referirse a un
/// bloque existente de una función con cuerpo. Emitir antes de fijar
/// un punto de inserción válido es un error de programación y un
/// backend puede abortar ante ello.
pub trait Sink {
    /// Declara una función externa, sin cuerpo.
    fn declare_function(&mut self, name: &str, parameters: &[&str]) -> FunctionId;

    fn lookup_function(&self, name: &str) -> Option<Signature>;

    fn remove_function(&mut self, function: FunctionId);

    fn verify_function(&self, function: FunctionId) -> Result<(), VerifyError>;

    /// Agrega un bloque al final de una función. Crear el primer bloque
    /// de una función externa le otorga un cuerpo.
    fn create_block(&mut self, function: FunctionId, name: &str) -> Label;

    fn position_at(&mut self, function: FunctionId, block: Label);

    /// Obtiene el valor de un argumento de la función actual.
    fn parameter(&mut self, index: u32) -> Local;

    fn alloc_slot(&mut self, name: &str) -> Slot;

    fn load(&mut self, slot: Slot) -> Local;

    fn store(&mut self, value: Local, slot: Slot);

    fn constant(&mut self, constant: Constant) -> Local;

    fn arith(&mut self, op: ArithOp, left: Local, right: Local) -> Local;

    /// Compara dos números, resultando en un booleano.
    fn compare(&mut self, cond: Cond, left: Local, right: Local) -> Local;

    /// Convierte un booleano en `1.0` o `0.0`.
    fn widen(&mut self, value: Local) -> Local;

    fn call(&mut self, function: FunctionId, arguments: Vec<Local>) -> Local;

    fn jump(&mut self, target: Label);

    fn branch(&mut self, condition: Local, then: Label, otherwise: Label);

    fn ret(&mut self, value: Local);
}

pub type Semantic<T> = Result<T, Located<SemanticError>>;

#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SemanticError {
    #[error("Variable `{0}` is already declared in this scope")]
    Redeclared(Identifier),

    #[error("Variable `{0}` is not declared")]
    Undeclared(Identifier),

    #[error("Call to undeclared function `{0}`")]
    UnknownFunction(Identifier),

    #[error("Function `{function}` takes {expected} argument(s), but {found} were supplied")]
    ArgumentCount {
        function: Identifier,
        expected: usize,
        found: usize,
    },

    #[error("Redefinition of function `{0}`")]
    Redefinition(Identifier),

    #[error("Type mismatch: expected `number`, found `string`")]
    ExpectedNumber,

    #[error("Strings cannot be stored in variable `{0}`")]
    StringAssignment(Identifier),

    #[error("Function `{function}` failed verification: {reason}")]
    Verification {
        function: Identifier,
        reason: VerifyError,
    },
}

/// Reduce todas las funciones de un programa.
///
/// Se reporta a lo sumo un error por función. Las funciones que
/// fallan se remueven del backend.
pub fn lower<S>(ast: &Ast, sink: &mut S) -> Result<(), Vec<Located<SemanticError>>>
where
    S: Sink + ?Sized,
{
    let errors: Vec<_> = ast
        .iter()
        .filter_map(|function| lower_function(sink, function).err())
        .collect();

    debug!(
        "Lowered {} of {} function(s)",
        ast.len() - errors.len(),
        ast.len()
    );

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Reduce una función completa.
pub fn lower_function<S>(sink: &mut S, function: &ast::Function) -> Semantic<FunctionId>
where
    S: Sink + ?Sized,
{
    let name = function.prototype().name();
    let id = declare(sink, function.prototype())?;

    let result = define(sink, id, function).and_then(|()| {
        sink.verify_function(id).map_err(|reason| {
            let error = SemanticError::Verification {
                function: name.val().clone(),
                reason,
            };

            Located::at(error, name.location())
        })
    });

    match result {
        Ok(()) => {
            debug!(
                "Lowered function `{}` with {} statement(s)",
                name.val(),
                function.body().len()
            );

            Ok(id)
        }

        Err(error) => {
            warn!("Removing function `{}`: {}", name.val(), error.val());
            sink.remove_function(id);

            Err(error)
        }
    }
}

/// Declara una firma, o reutiliza una declaración previa sin cuerpo.
fn declare<S>(sink: &mut S, prototype: &ast::Prototype) -> Semantic<FunctionId>
where
    S: Sink + ?Sized,
{
    let name = prototype.name();
    let arity = prototype.parameters().len();

    match sink.lookup_function(name.val().as_ref()) {
        Some(Signature {
            id,
            arity: declared,
            defined: false,
        }) if declared == arity => Ok(id),

        Some(_) => {
            let error = SemanticError::Redefinition(name.val().clone());
            Err(Located::at(error, name.location()))
        }

        None => {
            let parameters: Vec<&str> = prototype
                .parameters()
                .iter()
                .map(|parameter| parameter.val().as_ref())
                .collect();

            Ok(sink.declare_function(name.val().as_ref(), &parameters))
        }
    }
}

fn define<S>(sink: &mut S, id: FunctionId, function: &ast::Function) -> Semantic<()>
where
    S: Sink + ?Sized,
{
    let entry = sink.create_block(id, crate::ir::ENTRY);
    let exit = sink.create_block(id, EXIT);

    sink.position_at(id, entry);
    let retvalue = sink.alloc_slot("retvalue");
    let zero = sink.constant(Constant::Number(0.0));
    sink.store(zero, retvalue);

    let mut context = Context {
        sink,
        env: Environment::new(),
        function: id,
        exit,
        retvalue,
    };

    context.scoped(|context| {
        for (index, parameter) in function.prototype().parameters().iter().enumerate() {
            let value = context.sink.parameter(index as u32);
            context.env.declare(context.sink, parameter, value)?;
        }

        context.block(function.body())
    })?;

    context.sink.jump(exit);
    context.sink.position_at(id, exit);

    let result = context.sink.load(retvalue);
    context.sink.ret(result);

    Ok(())
}

/// Estado de reducción de una función.
struct Context<'s, S: Sink + ?Sized> {
    sink: &'s mut S,
    env: Environment,
    function: FunctionId,
    exit: Label,
    retvalue: Slot,
}

impl<S: Sink + ?Sized> Context<'_, S> {
    /// Ejecuta dentro de un ámbito nuevo, el cual se cierra aún si
    /// ocurre un error.
    fn scoped<F, R>(&mut self, scope: F) -> Semantic<R>
    where
        F: FnOnce(&mut Self) -> Semantic<R>,
    {
        let (function, exit) = self.frame();
        self.env.push(function, exit);
        let result = scope(self);
        self.env.pop();

        result
    }

    /// Función y bloque de salida del ámbito más interno. Fuera de todo
    /// ámbito corresponden a la función que se reduce.
    fn frame(&self) -> (FunctionId, Label) {
        self.env.current().unwrap_or((self.function, self.exit))
    }
}
