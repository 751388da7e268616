//! Reporte de errores con ubicación.
//!
//! Todas las fases producen errores distintos, pero cada uno de ellos
//! se envuelve en [`Located`]. [`Diagnostics`] agrupa errores de
//! cualquier fase y los despliega junto al fragmento de código fuente
//! donde ocurren.

use crate::source::{Located, Location, Source};
use std::{
    error::Error,
    fmt::{self, Display},
    rc::Rc,
};

mod sealed {
    pub trait Sealed {}
}

pub trait LocatedError: sealed::Sealed {
    fn source(&self) -> &dyn Error;
    fn location(&self) -> Location;
}

#[derive(Default)]
pub struct Diagnostics {
    source: Option<Rc<Source>>,
    errors: Vec<Box<dyn 'static + LocatedError>>,
}

impl Diagnostics {
    /// Asocia el programa fuente, lo cual permite mostrar fragmentos.
    pub fn with_source(self, source: Rc<Source>) -> Self {
        Diagnostics {
            source: Some(source),
            ..self
        }
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }
}

impl<E: 'static + LocatedError> From<E> for Diagnostics {
    fn from(error: E) -> Self {
        Diagnostics {
            errors: vec![Box::new(error)],
            ..Default::default()
        }
    }
}

impl<E: 'static + LocatedError> From<Vec<E>> for Diagnostics {
    fn from(errors: Vec<E>) -> Self {
        let errors = errors
            .into_iter()
            .map(|error| {
                let error: Box<dyn LocatedError> = Box::new(error);
                error
            })
            .collect();

        Diagnostics {
            errors,
            ..Default::default()
        }
    }
}

impl fmt::Debug for Diagnostics {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        Display::fmt(self, fmt)
    }
}

impl Display for Diagnostics {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Diagnostics { source, errors } = self;

        if errors.is_empty() {
            return writeln!(fmt, "No errors were reported");
        }

        for error in errors {
            writeln!(fmt, "error: {}", error.source())?;

            let location = error.location();
            match source {
                Some(source) => writeln!(fmt, " --> {}:{}", source.name(), location)?,
                None => writeln!(fmt, " --> {}", location)?,
            }

            let line = source
                .as_ref()
                .and_then(|source| source.line(location.line()));

            if let Some(line) = line {
                let digits = location.line().to_string().len();
                writeln!(fmt, "{:digits$} |", "", digits = digits)?;
                writeln!(fmt, "{} | {}", location.line(), line)?;

                let skip = location.column().saturating_sub(1) as usize;
                writeln!(fmt, "{:digits$} | {:skip$}^", "", "", digits = digits, skip = skip)?;
            }

            writeln!(fmt)?;
        }

        let error_or_errors = if errors.len() == 1 { "error" } else { "errors" };
        writeln!(
            fmt,
            "Build failed with {} {}",
            errors.len(),
            error_or_errors
        )
    }
}

impl<E: Error> sealed::Sealed for Located<E> {}

impl<E: Error> LocatedError for Located<E> {
    fn source(&self) -> &dyn Error {
        self.val()
    }

    fn location(&self) -> Location {
        Located::location(self)
    }
}
