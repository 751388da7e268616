//! Ámbitos léxicos de variables.
//!
//! Los ámbitos forman una pila: el tope es el ámbito más interno y las
//! búsquedas proceden desde el tope hacia el fondo. Los marcos nunca
//! exponen sus tablas; la única forma de alterarlos es por medio de
//! [`Environment::declare`], [`Environment::assign`],
//! [`Environment::push`] y [`Environment::pop`].

use std::collections::HashMap;

use log::trace;

use super::{Semantic, SemanticError, Sink};
use crate::{
    ir::{FunctionId, Label, Local, Slot},
    lex::Identifier,
    source::Located,
};

/// Pila de ámbitos activos.
#[derive(Default)]
pub struct Environment {
    frames: Vec<Frame>,
}

struct Frame {
    function: FunctionId,
    exit: Label,
    symbols: HashMap<Identifier, Slot>,
}

impl Environment {
    pub fn new() -> Self {
        Environment::default()
    }

    /// Abre un ámbito asociado a una función y su bloque de salida.
    pub fn push(&mut self, function: FunctionId, exit: Label) {
        trace!("Entering scope at depth {}", self.frames.len() + 1);

        self.frames.push(Frame {
            function,
            exit,
            symbols: HashMap::new(),
        });
    }

    /// Cierra el ámbito más interno, descartando sus variables.
    pub fn pop(&mut self) {
        self.frames.pop();
        trace!("Leaving scope, depth is now {}", self.frames.len());
    }

    /// Función y bloque de salida del ámbito más interno.
    pub fn current(&self) -> Option<(FunctionId, Label)> {
        self.frames.last().map(|frame| (frame.function, frame.exit))
    }

    /// Declara una variable en el ámbito más interno.
    ///
    /// Se reserva un slot nuevo en el cual se almacena `value`. Si el
    /// nombre ya existe en este mismo ámbito la declaración falla y el
    /// slot anterior permanece intacto. Los ámbitos externos pueden
    /// ser ocultados.
    pub fn declare<S>(
        &mut self,
        sink: &mut S,
        name: &Located<Identifier>,
        value: Local,
    ) -> Semantic<Slot>
    where
        S: Sink + ?Sized,
    {
        let frame = match self.frames.last_mut() {
            Some(frame) => frame,
            None => return Err(undeclared(name)),
        };

        if frame.symbols.contains_key(name.val()) {
            let error = SemanticError::Redeclared(name.val().clone());
            return Err(Located::at(error, name.location()));
        }

        let slot = sink.alloc_slot(name.val().as_ref());
        sink.store(value, slot);
        frame.symbols.insert(name.val().clone(), slot);

        Ok(slot)
    }

    /// Almacena un valor en la declaración visible más interna.
    pub fn assign<S>(
        &mut self,
        sink: &mut S,
        name: &Located<Identifier>,
        value: Local,
    ) -> Semantic<Slot>
    where
        S: Sink + ?Sized,
    {
        let slot = self.lookup(name)?;
        sink.store(value, slot);

        Ok(slot)
    }

    /// Lee el valor actual de la declaración visible más interna.
    pub fn read<S>(&self, sink: &mut S, name: &Located<Identifier>) -> Semantic<Local>
    where
        S: Sink + ?Sized,
    {
        let slot = self.lookup(name)?;
        Ok(sink.load(slot))
    }

    /// Resuelve el slot de un nombre sin emitir código.
    pub fn lookup(&self, name: &Located<Identifier>) -> Semantic<Slot> {
        self.frames
            .iter()
            .rev()
            .find_map(|frame| frame.symbols.get(name.val()).copied())
            .ok_or_else(|| undeclared(name))
    }
}

fn undeclared(name: &Located<Identifier>) -> Located<SemanticError> {
    Located::at(SemanticError::Undeclared(name.val().clone()), name.location())
}
