use log::trace;

use super::{
    verify, ArithOp, Block, Body, Cond, Constant, Cursor, Function, FunctionBody, FunctionId,
    Instruction, Label, Local, Module, Signature, Slot, ValueType, VerifyError,
};

use crate::semantic::Sink;

impl Module {
    fn body(&mut self) -> &mut Body {
        match &mut self.functions[self.cursor.function].body {
            FunctionBody::Generated(body) => body,
            FunctionBody::External => unreachable!("emission before `position_at`"),
        }
    }

    fn push(&mut self, instruction: Instruction) {
        let block = self.cursor.block;
        self.body().blocks[block].code.push(instruction);
    }

    fn push_value<F>(&mut self, typ: ValueType, instruction: F) -> Local
    where
        F: FnOnce(Local) -> Instruction,
    {
        let output = self.body().define(typ);
        self.push(instruction(output));

        output
    }
}

impl Sink for Module {
    fn declare_function(&mut self, name: &str, parameters: &[&str]) -> FunctionId {
        self.functions.push(Function::external(name, parameters));
        FunctionId(self.functions.len() as u32 - 1)
    }

    fn lookup_function(&self, name: &str) -> Option<Signature> {
        let index = self.position(name)?;
        let function = &self.functions[index];

        Some(Signature {
            id: FunctionId(index as u32),
            arity: function.arity(),
            defined: !function.is_external(),
        })
    }

    fn remove_function(&mut self, function: FunctionId) {
        let index = function.0 as usize;
        if index < self.functions.len() {
            let removed = self.functions.remove(index);
            trace!("Removed function `{}` from module", removed.name);
        }

        self.cursor = Cursor::default();
    }

    fn verify_function(&self, function: FunctionId) -> Result<(), VerifyError> {
        match self.functions.get(function.0 as usize) {
            Some(target) => verify(self, target),
            None => Err(VerifyError::UnknownFunction(format!("#{}", function.0))),
        }
    }

    fn create_block(&mut self, function: FunctionId, name: &str) -> Label {
        let function = &mut self.functions[function.0 as usize];
        if function.is_external() {
            function.body = FunctionBody::Generated(Body::default());
        }

        let body = match &mut function.body {
            FunctionBody::Generated(body) => body,
            FunctionBody::External => unreachable!(),
        };

        body.blocks.push(Block {
            name: name.to_owned(),
            code: Vec::new(),
        });

        let label = Label(body.blocks.len() as u32 - 1);
        trace!("Created block {}.{} in `{}`", name, label.0, function.name);

        label
    }

    fn position_at(&mut self, function: FunctionId, block: Label) {
        debug_assert!(
            self.functions
                .get(function.0 as usize)
                .and_then(Function::generated)
                .map_or(false, |body| (block.0 as usize) < body.blocks.len()),
            "insertion point outside of any generated block"
        );

        self.cursor = Cursor {
            function: function.0 as usize,
            block: block.0 as usize,
        };
    }

    fn parameter(&mut self, index: u32) -> Local {
        self.push_value(ValueType::Number, |output| Instruction::Param(index, output))
    }

    fn alloc_slot(&mut self, name: &str) -> Slot {
        let body = self.body();
        body.slots.push(name.to_owned());

        Slot(body.slots.len() as u32 - 1)
    }

    fn load(&mut self, slot: Slot) -> Local {
        self.push_value(ValueType::Number, |output| Instruction::Load(slot, output))
    }

    fn store(&mut self, value: Local, slot: Slot) {
        self.push(Instruction::Store(value, slot));
    }

    fn constant(&mut self, constant: Constant) -> Local {
        self.push_value(constant.typ(), |output| Instruction::Const(constant, output))
    }

    fn arith(&mut self, op: ArithOp, left: Local, right: Local) -> Local {
        self.push_value(ValueType::Number, |output| Instruction::Arith {
            op,
            left,
            right,
            output,
        })
    }

    fn compare(&mut self, cond: Cond, left: Local, right: Local) -> Local {
        self.push_value(ValueType::Bool, |output| Instruction::Compare {
            cond,
            left,
            right,
            output,
        })
    }

    fn widen(&mut self, value: Local) -> Local {
        self.push_value(ValueType::Number, |output| Instruction::Widen(value, output))
    }

    fn call(&mut self, function: FunctionId, arguments: Vec<Local>) -> Local {
        let target = self.functions[function.0 as usize].name.clone();
        self.push_value(ValueType::Number, |output| Instruction::Call {
            target,
            arguments,
            output,
        })
    }

    fn jump(&mut self, target: Label) {
        self.push(Instruction::Jump(target));
    }

    fn branch(&mut self, condition: Local, then: Label, otherwise: Label) {
        self.push(Instruction::Branch {
            condition,
            then,
            otherwise,
        });
    }

    fn ret(&mut self, value: Local) {
        self.push(Instruction::Return(value));
    }
}
