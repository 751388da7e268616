//! Validación estructural de funciones generadas.

use thiserror::Error;

use super::{Body, Function, Instruction, Label, Local, Module, Slot, ValueType};

#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum VerifyError {
    #[error("Function has no blocks")]
    EmptyBody,

    #[error("Block `{0}` does not end in a terminator")]
    MissingTerminator(String),

    #[error("Block `{0}` has instructions after its terminator")]
    InstructionAfterTerminator(String),

    #[error("Reference to nonexistent block {0}")]
    DanglingBlock(Label),

    #[error("Value {0} is used but never defined")]
    DanglingValue(Local),

    #[error("Reference to nonexistent slot {0}")]
    DanglingSlot(Slot),

    #[error("Value {0} is defined more than once")]
    Redefined(Local),

    #[error("Parameter index {0} is out of range")]
    InvalidParameter(u32),

    #[error("Type mismatch for {value}: expected `{expected}`, found `{found}`")]
    TypeMismatch {
        value: Local,
        expected: ValueType,
        found: ValueType,
    },

    #[error("Call to unknown function `{0}`")]
    UnknownFunction(String),

    #[error("Function `{function}` takes {expected} argument(s), but {found} were supplied")]
    ArgumentCount {
        function: String,
        expected: usize,
        found: usize,
    },
}

/// Verifica la buena formación de una función del módulo.
///
/// Las funciones externas son siempre válidas. En las generadas, cada
/// bloque debe terminar en exactamente una instrucción terminadora,
/// toda referencia a bloques, slots y valores debe existir, cada valor
/// se define una sola vez y los operandos respetan sus tipos.
pub fn verify(module: &Module, function: &Function) -> Result<(), VerifyError> {
    let body = match function.generated() {
        Some(body) => body,
        None => return Ok(()),
    };

    if body.blocks.is_empty() {
        return Err(VerifyError::EmptyBody);
    }

    let mut defined = vec![false; body.values.len()];
    for block in &body.blocks {
        match block.code.split_last() {
            Some((last, rest)) if last.is_terminator() => {
                if rest.iter().any(Instruction::is_terminator) {
                    return Err(VerifyError::InstructionAfterTerminator(block.name.clone()));
                }
            }

            Some(_) if block.code.iter().any(Instruction::is_terminator) => {
                return Err(VerifyError::InstructionAfterTerminator(block.name.clone()))
            }

            _ => return Err(VerifyError::MissingTerminator(block.name.clone())),
        }

        for output in block.code.iter().filter_map(Instruction::output) {
            match defined.get_mut(output.0 as usize) {
                None => return Err(VerifyError::DanglingValue(output)),
                Some(true) => return Err(VerifyError::Redefined(output)),
                Some(seen) => *seen = true,
            }
        }
    }

    let check = Checker {
        module,
        function,
        body,
        defined: &defined,
    };

    body.blocks
        .iter()
        .flat_map(|block| block.code.iter())
        .try_for_each(|instruction| check.instruction(instruction))
}

struct Checker<'a> {
    module: &'a Module,
    function: &'a Function,
    body: &'a Body,
    defined: &'a [bool],
}

impl Checker<'_> {
    fn instruction(&self, instruction: &Instruction) -> Result<(), VerifyError> {
        use Instruction::*;
        use ValueType::{Bool, Number};

        for input in instruction.inputs() {
            if !self.defined.get(input.0 as usize).copied().unwrap_or(false) {
                return Err(VerifyError::DanglingValue(input));
            }
        }

        for label in instruction.successors() {
            if self.body.block(label).is_none() {
                return Err(VerifyError::DanglingBlock(label));
            }
        }

        match instruction {
            Const(..) | Jump(_) => Ok(()),

            Param(index, _) => {
                if (*index as usize) < self.function.arity() {
                    Ok(())
                } else {
                    Err(VerifyError::InvalidParameter(*index))
                }
            }

            Load(slot, _) => self.slot(*slot),

            Store(value, slot) => {
                self.slot(*slot)?;
                self.expect(*value, Number)
            }

            Arith { left, right, .. } | Compare { left, right, .. } => {
                self.expect(*left, Number)?;
                self.expect(*right, Number)
            }

            Widen(value, _) => self.expect(*value, Bool),
            Branch { condition, .. } => self.expect(*condition, Bool),
            Return(value) => self.expect(*value, Number),

            Call {
                target, arguments, ..
            } => {
                let callee = self
                    .module
                    .function(target)
                    .ok_or_else(|| VerifyError::UnknownFunction(target.clone()))?;

                if callee.arity() != arguments.len() {
                    return Err(VerifyError::ArgumentCount {
                        function: target.clone(),
                        expected: callee.arity(),
                        found: arguments.len(),
                    });
                }

                arguments
                    .iter()
                    .try_for_each(|argument| self.expect(*argument, Number))
            }
        }
    }

    fn slot(&self, slot: Slot) -> Result<(), VerifyError> {
        if (slot.0 as usize) < self.body.slots.len() {
            Ok(())
        } else {
            Err(VerifyError::DanglingSlot(slot))
        }
    }

    fn expect(&self, value: Local, expected: ValueType) -> Result<(), VerifyError> {
        // Los valores no definidos ya fueron rechazados
        match self.body.type_of(value) {
            Some(found) if found != expected => Err(VerifyError::TypeMismatch {
                value,
                expected,
                found,
            }),

            _ => Ok(()),
        }
    }
}
