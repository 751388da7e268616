//! Front end para el lenguaje Fun.
//!
//! Cada programa deriva de un único archivo de código fuente.
//! Este archivo se somete primero a análisis léxico en [`lex`], de
//! lo cual se obtiene un flujo de tokens terminado en fin de entrada.
//! El flujo de tokens se dispone en un AST, descrito en [`ast`], por
//! medio de análisis sintáctico en [`parse`]. El árbol sintáctico es
//! procesado por análisis semántico en [`semantic`], el cual emite una
//! representación intermedia por bloques básicos a través de un
//! [`semantic::Sink`]. La implementación de referencia de este último
//! es [`ir::Module`].
//!
//! Cada fase acumula sus errores en vez de detenerse en el primero.
//! Los errores se reportan al usuario por medio de
//! [`error::Diagnostics`].

use std::rc::Rc;

pub mod ast;
pub mod error;
pub mod ir;
pub mod lex;
pub mod parse;
pub mod semantic;
pub mod source;

use error::Diagnostics;
use source::Source;

/// Compila un programa completo hacia un módulo.
///
/// Las fases se detienen tras la primera que reporte errores. En caso
/// de errores semánticos el módulo conserva las funciones correctas.
pub fn compile(source: Rc<Source>, module: &mut ir::Module) -> Result<(), Diagnostics> {
    let attach = |diagnostics: Diagnostics| diagnostics.with_source(Rc::clone(&source));

    let tokens = lex::Lexer::new(source.text())
        .try_exhaustive()
        .map_err(|errors| attach(errors.into()))?;

    let ast = parse::parse(&tokens).map_err(|errors| attach(errors.into()))?;
    semantic::lower(&ast, module).map_err(|errors| attach(errors.into()))
}
