use log::trace;

use super::{Context, Semantic, Sink};
use crate::{
    ast::Node,
    ir::{Cond, Label},
};

impl<S: Sink + ?Sized> Context<'_, S> {
    /// Reduce una secuencia de sentencias en el ámbito actual.
    pub(super) fn block(&mut self, statements: &[Node]) -> Semantic<()> {
        statements
            .iter()
            .try_for_each(|statement| self.statement(statement))
    }

    pub(super) fn statement(&mut self, node: &Node) -> Semantic<()> {
        match node {
            Node::If {
                condition,
                then,
                otherwise,
            } => self.conditional(condition, then, otherwise),

            // El salto hacia la salida es responsabilidad de quien contiene al retorno
            Node::Return(value) => {
                let value = self.expr(value)?.number()?;
                self.sink.store(value, self.retvalue);

                Ok(())
            }

            _ => self.expr(node).map(|_| ()),
        }
    }

    fn conditional(&mut self, condition: &Node, then: &[Node], otherwise: &[Node]) -> Semantic<()> {
        let condition = self.expr(condition)?.number()?;
        let zero = self.number(0.0);
        let test = self.sink.compare(Cond::NotEqual, condition, zero);

        let (function, _) = self.frame();
        let then_block = self.sink.create_block(function, "then");
        let else_block = self.sink.create_block(function, "else");
        let merge = self.sink.create_block(function, "ifcont");

        self.sink.branch(test, then_block, else_block);

        self.branch(then_block, then, merge)?;
        self.branch(else_block, otherwise, merge)?;

        self.sink.position_at(function, merge);
        Ok(())
    }

    /// Reduce una rama en su propio ámbito, terminando en la salida de
    /// la función si la rama retorna o en `merge` en caso contrario.
    fn branch(&mut self, block: Label, statements: &[Node], merge: Label) -> Semantic<()> {
        let exit = self.scoped(|this| {
            let (function, exit) = this.frame();
            this.sink.position_at(function, block);
            this.block(statements)?;

            Ok(exit)
        })?;

        let returns = statements
            .iter()
            .any(|statement| matches!(statement, Node::Return(_)));

        let target = if returns { exit } else { merge };
        trace!("Branch {:?} continues at {:?}", block, target);

        self.sink.jump(target);
        Ok(())
    }
}
