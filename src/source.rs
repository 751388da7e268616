//! Rastreo de ubicaciones originales en código fuente.
//!
//! Los distintos objetos internos que el compilador construye
//! deben llevar cuenta de la posición en el código fuente original
//! donde se originan, lo cual permite señalar un punto exacto o
//! aproximado en donde ocurre un error de abstracción arbitraria.

use std::{
    fmt::{self, Debug, Display, Formatter},
    io::{self, Read},
};

/// Ancho de los divisores de tabulador.
const TAB_STOP: u32 = 4;

/// Un programa fuente completo junto a su nombre de origen.
pub struct Source {
    name: String,
    text: String,
}

impl Source {
    /// Construye a partir de un nombre y el texto completo.
    pub fn new<N, T>(name: N, text: T) -> Self
    where
        N: Into<String>,
        T: Into<String>,
    {
        Source {
            name: name.into(),
            text: text.into(),
        }
    }

    /// Consume un flujo de entrada completo.
    pub fn read<R, N>(mut reader: R, name: N) -> io::Result<Self>
    where
        R: Read,
        N: Into<String>,
    {
        let mut text = String::new();
        reader.read_to_string(&mut text)?;

        Ok(Source::new(name, text))
    }

    /// Nombre de origen, usualmente una ruta.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Texto completo.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Obtiene una línea del texto, contando a partir de 1.
    pub fn line(&self, number: u32) -> Option<&str> {
        let index = number.checked_sub(1)? as usize;
        self.text.lines().nth(index)
    }
}

/// Un objeto cualquiera con una posición original asociada.
#[derive(Debug, Clone, PartialEq)]
pub struct Located<T> {
    location: Location,
    value: T,
}

impl<T> Located<T> {
    /// Obtiene el valor.
    pub fn val(&self) -> &T {
        &self.value
    }

    /// Obtiene la ubicación.
    pub fn location(&self) -> Location {
        self.location
    }

    /// Descarta la ubicación y toma ownership del valor.
    pub fn into_inner(self) -> T {
        self.value
    }

    /// Descompone y toma ownership de las dos partes.
    pub fn split(self) -> (Location, T) {
        (self.location, self.value)
    }

    /// Construye a partir de un valor y una ubicación.
    pub fn at(value: T, location: Location) -> Self {
        Located { value, location }
    }

    /// Transforma el valor con la misma ubicación.
    pub fn map<U, F>(self, map: F) -> Located<U>
    where
        F: FnOnce(T) -> U,
    {
        Located {
            value: map(self.value),
            location: self.location,
        }
    }
}

impl<T> AsRef<T> for Located<T> {
    fn as_ref(&self) -> &T {
        &self.value
    }
}

/// Una posición línea-columna en el código fuente.
#[derive(Copy, Clone, Eq, PartialEq)]
pub struct Location {
    line: u32,
    column: u32,
}

impl Location {
    /// Construye una ubicación arbitraria.
    pub fn new(line: u32, column: u32) -> Self {
        Location { line, column }
    }

    /// Obtiene el número de línea.
    pub fn line(&self) -> u32 {
        self.line
    }

    /// Obtiene el número de columna.
    pub fn column(&self) -> u32 {
        self.column
    }

    /// Calcula la ubicación que sigue a un carácter en esta posición.
    pub fn after(self, c: char) -> Location {
        match c {
            '\n' => Location {
                line: self.line + 1,
                column: 1,
            },

            // Ajuste a la siguiente columna de tabulador
            '\t' => Location {
                line: self.line,
                column: 1 + ((self.column - 1) / TAB_STOP + 1) * TAB_STOP,
            },

            _ => Location {
                line: self.line,
                column: self.column + 1,
            },
        }
    }
}

impl Default for Location {
    fn default() -> Self {
        Location { line: 1, column: 1 }
    }
}

impl Display for Location {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}:{}", self.line, self.column)
    }
}

impl Debug for Location {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        <Self as Display>::fmt(self, formatter)
    }
}
