//! Análisis léxico.
//!
//! # Tokenization
//! Esta es la primera fase del compilador. Descompone el texto fuente
//! en unidades léxicas denominadas tokens. Los espacios en blanco y los
//! comentarios se descartan durante esta operación. Cada token emitido
//! está asociado a una ubicación en el código fuente original, lo cual
//! permite rastrear errores tanto en los mismos como en constructos más
//! elevados de fases posteriores.
//!
//! # Contenido de un token
//! Todo token conserva su lexema exacto tal como aparece en la fuente,
//! incluyendo las comillas de los literales de string. Esto permite
//! reconstruir un flujo equivalente concatenando los lexemas. El último
//! token de todo flujo exitoso es [`TokenKind::Eof`], con lexema vacío.
//!
//! # Reglas importantes del lenguaje
//! - Los identificadores comienzan con una letra ASCII y continúan con
//!   letras o dígitos.
//! - Las palabras clave se distinguen de los identificadores por medio
//!   de una tabla fija. Una palabra que no aparece en la tabla es siempre
//!   un identificador.
//! - Los literales numéricos no tienen signo ni exponente. La parte
//!   fraccionaria requiere al menos un dígito luego del punto.
//!
//! # Errores
//! El lexer se recupera de condiciones de error carácter por carácter.
//! Esto permite reportar todos los errores léxicos en una misma ejecución,
//! pero no permite el avance a las demás fases de la compilación.

use crate::source::{Located, Location};
use std::{
    fmt::{self, Display},
    rc::Rc,
    str::FromStr,
};

use thiserror::Error;

/// Error de escaneo.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LexerError {
    /// Carácter desconocido o inesperado en el flujo de entrada.
    #[error("Unexpected character {0:?}")]
    UnexpectedChar(char),

    /// Se alcanzó el final de la entrada dentro de un literal de string.
    #[error("Unterminated string")]
    UnterminatedString,
}

/// Un identificador.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identifier(Rc<str>);

impl Identifier {
    pub fn new(name: &str) -> Self {
        Identifier(Rc::from(name))
    }
}

impl AsRef<str> for Identifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Display for Identifier {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt.write_str(&self.0)
    }
}

/// Objeto resultante del análisis léxico.
///
/// Un token contiene suficiente información para describir completamente
/// a una entidad léxica en el programa fuente.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    kind: TokenKind,
    lexeme: String,
    location: Location,
}

impl Token {
    pub fn new<S: Into<String>>(kind: TokenKind, lexeme: S, location: Location) -> Self {
        Token {
            kind,
            lexeme: lexeme.into(),
            location,
        }
    }

    /// Etiqueta de clase del token.
    pub fn kind(&self) -> TokenKind {
        self.kind
    }

    /// Texto original.
    pub fn lexeme(&self) -> &str {
        &self.lexeme
    }

    /// Ubicación del primer carácter.
    pub fn location(&self) -> Location {
        self.location
    }

    /// Línea donde comienza el token.
    pub fn line(&self) -> u32 {
        self.location.line()
    }

    /// Contenido de un literal de string, sin comillas.
    pub fn string_value(&self) -> Option<&str> {
        match self.kind {
            TokenKind::String => self
                .lexeme
                .strip_prefix('"')
                .and_then(|rest| rest.strip_suffix('"')),

            _ => None,
        }
    }
}

impl Display for Token {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        use TokenKind::*;

        match self.kind {
            Identifier => write!(fmt, "identifier `{}`", self.lexeme),
            Number => write!(fmt, "literal `{}`", self.lexeme),
            String => write!(fmt, "literal {}", self.lexeme),
            kind => kind.fmt(fmt),
        }
    }
}

/// Clase de token.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TokenKind {
    /// `(`
    LeftParen,

    /// `)`
    RightParen,

    /// `{`
    LeftBrace,

    /// `}`
    RightBrace,

    /// `,`
    Comma,

    /// `.`
    Dot,

    /// `-`
    Minus,

    /// `+`
    Plus,

    /// `;`
    Semicolon,

    /// `:`
    Colon,

    /// `/`
    Slash,

    /// `*`
    Star,

    /// `!`
    Bang,

    /// `!=`
    BangEqual,

    /// `=`
    Equal,

    /// `==`
    EqualEqual,

    /// `>`
    Greater,

    /// `>=`
    GreaterEqual,

    /// `<`
    Less,

    /// `<=`
    LessEqual,

    /// Identificador.
    Identifier,

    /// Literal de string.
    String,

    /// Literal numérico.
    Number,

    /// Palabra clave.
    Keyword(Keyword),

    /// Fin de la entrada.
    Eof,
}

impl Display for TokenKind {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        use TokenKind::*;

        let string = match self {
            LeftParen => "`(`",
            RightParen => "`)`",
            LeftBrace => "`{`",
            RightBrace => "`}`",
            Comma => "`,`",
            Dot => "`.`",
            Minus => "`-`",
            Plus => "`+`",
            Semicolon => "`;`",
            Colon => "`:`",
            Slash => "`/`",
            Star => "`*`",
            Bang => "`!`",
            BangEqual => "`!=`",
            Equal => "`=`",
            EqualEqual => "`==`",
            Greater => "`>`",
            GreaterEqual => "`>=`",
            Less => "`<`",
            LessEqual => "`<=`",
            Identifier => "identifier",
            String => "string literal",
            Number => "number literal",
            Keyword(keyword) => return write!(fmt, "keyword `{}`", keyword),
            Eof => "end of input",
        };

        fmt.write_str(string)
    }
}

/// Una palabra clave.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Keyword {
    Else,
    Fun,
    If,
    Return,
    Var,
    Number,
    String,
}

impl Display for Keyword {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Keyword::*;
        let string = match self {
            Else   => "else",
            Fun    => "fun",
            If     => "if",
            Return => "return",
            Var    => "var",
            Number => "number",
            String => "string",
        };

        fmt.write_str(string)
    }
}

impl FromStr for Keyword {
    type Err = ();

    fn from_str(string: &str) -> Result<Self, Self::Err> {
        use Keyword::*;

        const KEYWORDS: &[(&str, Keyword)] = &[
            ("else",   Else),
            ("fun",    Fun),
            ("if",     If),
            ("return", Return),
            ("var",    Var),
            ("number", Number),
            ("string", String),
        ];

        KEYWORDS
            .iter()
            .find(|&&(name, _)| name == string)
            .map(|&(_, keyword)| keyword)
            .ok_or(())
    }
}

/// Máquina de estados para análisis léxico.
///
/// Un lexer puede encontrarse en uno de diversos estados. La
/// salida del lexer, así como su siguiente estado, se define
/// a partir de tanto su estado actual como el siguiente carácter
/// encontrado en la entrada.
pub struct Lexer<'a> {
    text: &'a str,
    state: State,
    start: usize,
    current: usize,
    start_location: Location,
    next_location: Location,
    finished: bool,
}

/// Posibles estados del lexer.
enum State {
    /// Estado que ocurre antes de encontrar el inicio de un token.
    Start,

    /// Estado de completitud; siempre emite el token incluido
    /// y pasa a [`State::Start`].
    Complete(TokenKind),

    /// Se encontró `/`, que puede iniciar un comentario.
    CommentStart,

    /// Comentario de línea.
    ///
    /// Este estado vuelve a [`State::Start`] al encontrar `'\n'`.
    Comment,

    /// Se encontró el primer carácter de un operador que puede
    /// extenderse con `=`. El primer campo es la forma corta y
    /// el segundo la forma extendida.
    Operator(TokenKind, TokenKind),

    /// Parte entera de una constante numérica.
    Integer,

    /// Parte fraccionaria de una constante numérica.
    Fraction,

    /// Término que puede ser un identificador o una palabra clave.
    Word,

    /// Dentro de un literal de string.
    Str,
}

impl<'a> Lexer<'a> {
    /// Crea un lexer en estado inicial a partir del texto fuente.
    pub fn new(text: &'a str) -> Self {
        Lexer {
            text,
            state: State::Start,
            start: 0,
            current: 0,
            start_location: Location::default(),
            next_location: Location::default(),
            finished: false,
        }
    }

    /// Reduce la entrada a sea una secuencia de tokens terminada en
    /// [`TokenKind::Eof`] o una secuencia de errores.
    ///
    /// En caso de que ocurra al menos un error, el lexer dejará
    /// de buscar tokens exitosos y comenzará a acumular solamente
    /// errores. El propósito de esta función es permitir la
    /// recolección de múltiples errores léxicos en una misma ejecución
    /// del compilador.
    pub fn try_exhaustive(mut self) -> Result<Vec<Token>, Vec<Located<LexerError>>> {
        let mut tokens = Vec::new();

        while let Some(result) = self.next() {
            match result {
                Ok(token) => tokens.push(token),
                Err(error) => {
                    drop(tokens);

                    let mut errors = vec![error];
                    errors.extend(self.filter_map(Result::err));

                    return Err(errors);
                }
            }
        }

        Ok(tokens)
    }

    fn peek(&self) -> Option<char> {
        self.text[self.current..].chars().next()
    }

    fn peek_next(&self) -> Option<char> {
        self.text[self.current..].chars().nth(1)
    }

    /// Consume el carácter observado con lookahead.
    fn bump(&mut self) {
        if let Some(c) = self.peek() {
            self.current += c.len_utf8();
            self.next_location = self.next_location.after(c);
        }
    }

    /// Intenta construir un siguiente token.
    fn lex(&mut self) -> Result<Option<TokenKind>, LexerError> {
        use {State::*, TokenKind::*};

        loop {
            let (next_char, after_next) = (self.peek(), self.peek_next());

            // El origen del token se mueve junto a la posición
            // siguiente siempre que no se haya encontrado una
            // frontera de token
            if let Start = self.state {
                self.start = self.current;
                self.start_location = self.next_location;
            }

            // Switch table principal, determina cambios de estado
            // y de salida del lexer a partir de combinaciones del
            // estado actual y el siguiente carácter
            match (&mut self.state, next_char) {
                (Start, None) => return Ok(None),

                // Tokens triviales
                (Start, Some('(')) => self.state = Complete(LeftParen),
                (Start, Some(')')) => self.state = Complete(RightParen),
                (Start, Some('{')) => self.state = Complete(LeftBrace),
                (Start, Some('}')) => self.state = Complete(RightBrace),
                (Start, Some(',')) => self.state = Complete(Comma),
                (Start, Some('.')) => self.state = Complete(Dot),
                (Start, Some('-')) => self.state = Complete(Minus),
                (Start, Some('+')) => self.state = Complete(Plus),
                (Start, Some(';')) => self.state = Complete(Semicolon),
                (Start, Some(':')) => self.state = Complete(Colon),
                (Start, Some('*')) => self.state = Complete(Star),
                (Start, Some('/')) => self.state = CommentStart,

                // Operadores de uno o dos caracteres
                (Start, Some('!')) => self.state = Operator(Bang, BangEqual),
                (Start, Some('=')) => self.state = Operator(Equal, EqualEqual),
                (Start, Some('<')) => self.state = Operator(Less, LessEqual),
                (Start, Some('>')) => self.state = Operator(Greater, GreaterEqual),

                (Start, Some('"')) => self.state = Str,
                (Start, Some(c)) if c.is_ascii_alphabetic() => self.state = Word,
                (Start, Some(c)) if c.is_ascii_digit() => self.state = Integer,

                // Espacios en blanco y caracteres inesperados
                (Start, Some(' ' | '\t' | '\r' | '\n')) => (),
                (Start, Some(c)) => {
                    self.bump();
                    return Err(LexerError::UnexpectedChar(c));
                }

                // Emisión retardada de tokens cualesquiera
                (Complete(kind), _) => return Ok(Some(*kind)),

                // `//` inicia un comentario, `/` por sí solo es división
                (CommentStart, Some('/')) => self.state = Comment,
                (CommentStart, _) => return Ok(Some(Slash)),

                // Los comentarios descartan el resto de la línea
                (Comment, Some('\n')) => self.state = Start,
                (Comment, Some(_)) => (),
                (Comment, None) => self.state = Start,

                (Operator(_, long), Some('=')) => self.state = Complete(*long),
                (Operator(short, _), _) => return Ok(Some(*short)),

                (Integer, Some(c)) if c.is_ascii_digit() => (),
                (Integer, Some('.')) if matches!(after_next, Some(c) if c.is_ascii_digit()) => {
                    self.state = Fraction;
                }

                (Integer, _) => return Ok(Some(Number)),

                (Fraction, Some(c)) if c.is_ascii_digit() => (),
                (Fraction, _) => return Ok(Some(Number)),

                (Word, Some(c)) if c.is_ascii_alphanumeric() => (),
                (Word, _) => {
                    let word = &self.text[self.start..self.current];
                    let kind = match self::Keyword::from_str(word) {
                        Ok(keyword) => TokenKind::Keyword(keyword),
                        Err(()) => Identifier,
                    };

                    return Ok(Some(kind));
                }

                // Los strings pueden abarcar múltiples líneas
                (Str, Some('"')) => self.state = Complete(String),
                (Str, Some(_)) => (),
                (Str, None) => return Err(LexerError::UnterminatedString),
            }

            // Si no hubo retorno, aquí se consume el carácter que
            // se observó con lookahead anteriormente
            self.bump();
        }
    }
}

impl Iterator for Lexer<'_> {
    type Item = Result<Token, Located<LexerError>>;

    fn next(&mut self) -> Option<Self::Item> {
        let result = self.lex();
        self.state = State::Start;

        match result {
            Ok(Some(kind)) => {
                let lexeme = &self.text[self.start..self.current];
                Some(Ok(Token::new(kind, lexeme, self.start_location)))
            }

            Ok(None) if self.finished => None,
            Ok(None) => {
                self.finished = true;
                Some(Ok(Token::new(TokenKind::Eof, "", self.next_location)))
            }

            Err(error) => Some(Err(Located::at(error, self.start_location))),
        }
    }
}
