//! Análisis sintáctico.
//!
//! Parser descendente recursivo con precedencia por niveles. De menor
//! a mayor precedencia: asignación, igualdad, comparación, suma,
//! multiplicación, llamada y expresiones primarias. Todos los niveles
//! binarios asocian a la izquierda; la asignación asocia a la derecha.
//!
//! # Recuperación de errores
//! Al encontrar un error, el parser lo registra, descarta el nodo en
//! construcción y entra en modo pánico. Mientras dure el modo pánico no
//! se registran errores adicionales. Luego se descartan tokens hasta la
//! siguiente frontera de sentencia y el análisis continúa; el modo
//! pánico termina al comenzar la siguiente sentencia o declaración.
//! Una función que contenga cualquier error se descarta completa, pero
//! las demás declaraciones se conservan.

use log::debug;
use thiserror::Error;

use crate::{
    ast::{Ast, BinOp, Function, Node, Prototype, Type},
    lex::{Identifier, Keyword, Token, TokenKind},
    source::{Located, Location},
};

#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParserError {
    #[error("Expected {expected}, found {found}")]
    Expected { expected: TokenKind, found: Token },

    #[error("Expected an expression, found {0}")]
    ExpectedExpr(Token),

    #[error("Expected a function declaration, found {0}")]
    ExpectedDeclaration(Token),

    #[error("Expected `number` or `string`, found {0}")]
    ExpectedType(Token),

    #[error("Invalid assignment target")]
    InvalidAssignmentTarget,
}

/// Analiza un flujo de tokens terminado en [`TokenKind::Eof`].
///
/// Falla si ocurrió al menos un error, en cuyo caso se reportan todos
/// los errores que no fueron suprimidos por modo pánico.
pub fn parse(tokens: &[Token]) -> Result<Ast, Vec<Located<ParserError>>> {
    let (ast, errors) = Parser::new(tokens).parse_all();
    if errors.is_empty() {
        Ok(ast)
    } else {
        Err(errors)
    }
}

/// Marcador de fallo.
///
/// El error concreto ya fue registrado (o suprimido) en el momento
/// de fallar; este marcador solamente se propaga hacia arriba.
#[derive(Debug)]
struct Failure;

type Parse<T> = Result<T, Failure>;

pub struct Parser<'a> {
    tokens: &'a [Token],
    current: usize,
    eof: Token,
    panic: bool,
    tainted: bool,
    errors: Vec<Located<ParserError>>,
}

impl<'a> Parser<'a> {
    pub fn new(tokens: &'a [Token]) -> Self {
        let end = tokens.last().map(Token::location).unwrap_or_default();

        Parser {
            tokens,
            current: 0,
            eof: Token::new(TokenKind::Eof, "", end),
            panic: false,
            tainted: false,
            errors: Vec::new(),
        }
    }

    /// Analiza el programa completo.
    ///
    /// Retorna todas las declaraciones que no contienen errores junto
    /// con los errores encontrados.
    pub fn parse_all(mut self) -> (Ast, Vec<Located<ParserError>>) {
        let mut functions = Vec::new();

        while !self.at_end() {
            self.panic = false;
            self.tainted = false;

            match self.declaration() {
                Ok(function) if !self.tainted => functions.push(function),
                Ok(_) => (),
                Err(Failure) => self.synchronize_declaration(),
            }
        }

        debug!(
            "Parsed {} declaration(s), {} error(s)",
            functions.len(),
            self.errors.len()
        );

        (Ast::new(functions), self.errors)
    }

    fn declaration(&mut self) -> Parse<Function> {
        if self.matches(TokenKind::Keyword(Keyword::Fun)) {
            self.function()
        } else {
            let found = self.peek().clone();
            self.fail(ParserError::ExpectedDeclaration(found))
        }
    }

    fn function(&mut self) -> Parse<Function> {
        let name = self.id()?;

        self.expect(TokenKind::LeftParen)?;
        let mut parameters = Vec::new();
        if !self.check(TokenKind::RightParen) {
            loop {
                parameters.push(self.id()?);
                if !self.matches(TokenKind::Comma) {
                    break;
                }
            }
        }

        self.expect(TokenKind::RightParen)?;
        let body = self.block()?;

        Ok(Function::new(Prototype::new(name, parameters), body))
    }

    /// Bloque entre llaves.
    ///
    /// Una sentencia fallida se descarta y el bloque continúa desde la
    /// siguiente frontera de sentencia. La declaración que contiene al
    /// bloque queda marcada como fallida.
    fn block(&mut self) -> Parse<Vec<Node>> {
        self.expect(TokenKind::LeftBrace)?;

        let mut statements = Vec::new();
        while !self.check(TokenKind::RightBrace)
            && !self.check(TokenKind::Keyword(Keyword::Fun))
            && !self.at_end()
        {
            // Frontera de sentencia, termina el modo pánico
            self.panic = false;

            let start = self.current;
            match self.statement() {
                Ok(statement) => statements.push(statement),
                Err(Failure) => {
                    self.tainted = true;
                    self.synchronize();

                    // Un fallo sin progreso en un punto de sincronización
                    // ciclaría indefinidamente
                    if self.current == start {
                        self.advance();
                    }
                }
            }
        }

        self.expect(TokenKind::RightBrace)?;
        Ok(statements)
    }

    fn statement(&mut self) -> Parse<Node> {
        if self.matches(TokenKind::Keyword(Keyword::If)) {
            self.if_statement()
        } else if self.matches(TokenKind::Keyword(Keyword::Return)) {
            self.return_statement()
        } else if self.matches(TokenKind::Keyword(Keyword::Var)) {
            self.var_declaration()
        } else {
            let expr = self.expression()?;
            self.expect(TokenKind::Semicolon)?;

            Ok(expr)
        }
    }

    fn if_statement(&mut self) -> Parse<Node> {
        self.expect(TokenKind::LeftParen)?;
        let condition = self.expression()?;
        self.expect(TokenKind::RightParen)?;

        let then = self.block()?;
        let otherwise = if self.matches(TokenKind::Keyword(Keyword::Else)) {
            self.block()?
        } else {
            Vec::new()
        };

        Ok(Node::If {
            condition: Box::new(condition),
            then,
            otherwise,
        })
    }

    fn return_statement(&mut self) -> Parse<Node> {
        let value = self.expression()?;
        self.expect(TokenKind::Semicolon)?;

        Ok(Node::Return(Box::new(value)))
    }

    fn var_declaration(&mut self) -> Parse<Node> {
        let target = self.id()?;

        let of = if self.matches(TokenKind::Colon) {
            self.typ()?
        } else {
            Type::Number
        };

        let value = if self.matches(TokenKind::Equal) {
            Some(Box::new(self.expression()?))
        } else {
            None
        };

        self.expect(TokenKind::Semicolon)?;

        Ok(Node::Assign {
            target,
            value,
            declaration: true,
            of,
        })
    }

    fn typ(&mut self) -> Parse<Type> {
        match self.peek().kind() {
            TokenKind::Keyword(Keyword::Number) => {
                self.advance();
                Ok(Type::Number)
            }

            TokenKind::Keyword(Keyword::String) => {
                self.advance();
                Ok(Type::String)
            }

            _ => {
                let found = self.peek().clone();
                self.fail(ParserError::ExpectedType(found))
            }
        }
    }

    fn expression(&mut self) -> Parse<Node> {
        self.assignment()
    }

    fn assignment(&mut self) -> Parse<Node> {
        let target = self.equality()?;
        if !self.check(TokenKind::Equal) {
            return Ok(target);
        }

        let equals = self.advance().location();
        let value = self.assignment()?;

        match target {
            Node::Variable(target) => Ok(Node::Assign {
                target,
                value: Some(Box::new(value)),
                declaration: false,
                of: Type::Number,
            }),

            _ => self.fail_at(ParserError::InvalidAssignmentTarget, equals),
        }
    }

    fn equality(&mut self) -> Parse<Node> {
        self.left_associative(
            Self::comparison,
            &[
                (TokenKind::EqualEqual, BinOp::Equal),
                (TokenKind::BangEqual, BinOp::NotEqual),
            ],
        )
    }

    fn comparison(&mut self) -> Parse<Node> {
        self.left_associative(
            Self::term,
            &[
                (TokenKind::Less, BinOp::Less),
                (TokenKind::LessEqual, BinOp::LessOrEqual),
                (TokenKind::Greater, BinOp::Greater),
                (TokenKind::GreaterEqual, BinOp::GreaterOrEqual),
            ],
        )
    }

    fn term(&mut self) -> Parse<Node> {
        self.left_associative(
            Self::factor,
            &[(TokenKind::Plus, BinOp::Add), (TokenKind::Minus, BinOp::Sub)],
        )
    }

    fn factor(&mut self) -> Parse<Node> {
        self.left_associative(
            Self::call,
            &[(TokenKind::Star, BinOp::Mul), (TokenKind::Slash, BinOp::Div)],
        )
    }

    /// Un nivel de precedencia binaria: un operando del siguiente nivel
    /// seguido de cualquier cantidad de pares operador-operando,
    /// plegados hacia la izquierda.
    fn left_associative<F>(
        &mut self,
        mut operand: F,
        operators: &[(TokenKind, BinOp)],
    ) -> Parse<Node>
    where
        F: FnMut(&mut Self) -> Parse<Node>,
    {
        let mut expr = operand(self)?;

        loop {
            let next = self.peek().kind();
            let op = match operators.iter().find(|&&(kind, _)| kind == next) {
                Some(&(_, op)) => op,
                None => break Ok(expr),
            };

            let location = self.advance().location();
            let right = operand(self)?;

            expr = Node::Binary {
                op: Located::at(op, location),
                left: Box::new(expr),
                right: Box::new(right),
            };
        }
    }

    fn call(&mut self) -> Parse<Node> {
        let expr = self.primary()?;

        let callee = match expr {
            Node::Variable(callee) if self.check(TokenKind::LeftParen) => callee,
            expr => return Ok(expr),
        };

        self.advance();

        let mut args = Vec::new();
        if !self.check(TokenKind::RightParen) {
            loop {
                args.push(self.expression()?);
                if !self.matches(TokenKind::Comma) {
                    break;
                }
            }
        }

        self.expect(TokenKind::RightParen)?;
        Ok(Node::Call { callee, args })
    }

    fn primary(&mut self) -> Parse<Node> {
        let token = self.peek().clone();
        match token.kind() {
            TokenKind::Number => {
                self.advance();
                match token.lexeme().parse() {
                    Ok(number) => Ok(Node::Number(number)),
                    Err(_) => {
                        let location = token.location();
                        self.fail_at(ParserError::ExpectedExpr(token), location)
                    }
                }
            }

            TokenKind::String => {
                self.advance();
                let value = token.string_value().unwrap_or_default().to_owned();
                Ok(Node::Str(Located::at(value, token.location())))
            }

            TokenKind::Identifier => {
                self.advance();
                let id = Identifier::new(token.lexeme());
                Ok(Node::Variable(Located::at(id, token.location())))
            }

            TokenKind::LeftParen => {
                self.advance();
                let inner = self.expression()?;
                self.expect(TokenKind::RightParen)?;

                Ok(Node::Grouping(Box::new(inner)))
            }

            _ => self.fail(ParserError::ExpectedExpr(token)),
        }
    }

    fn id(&mut self) -> Parse<Located<Identifier>> {
        let token = self.expect(TokenKind::Identifier)?;
        Ok(Located::at(Identifier::new(token.lexeme()), token.location()))
    }

    /// Descarta tokens hasta la siguiente frontera de sentencia.
    ///
    /// Un `;` se consume; `}` y las palabras clave que inician sentencias
    /// o declaraciones se conservan. Un grupo `{ ... }` que comience
    /// dentro del fragmento descartado se omite completo, de modo que su
    /// `}` no cierre el bloque que lo contiene.
    fn synchronize(&mut self) {
        while !self.at_end() {
            match self.peek().kind() {
                TokenKind::Semicolon => {
                    self.advance();
                    break;
                }

                TokenKind::LeftBrace => self.skip_group(),

                TokenKind::RightBrace
                | TokenKind::Keyword(Keyword::If | Keyword::Return | Keyword::Var | Keyword::Fun) => {
                    break
                }

                _ => {
                    self.advance();
                }
            }
        }
    }

    /// Omite un grupo de llaves balanceado, incluyendo sus delimitadores.
    ///
    /// Se detiene antes de un `fun` si el grupo nunca se cierra.
    fn skip_group(&mut self) {
        let mut depth = 0usize;
        while !self.at_end() {
            match self.peek().kind() {
                TokenKind::LeftBrace => depth += 1,
                TokenKind::RightBrace => depth -= 1,
                TokenKind::Keyword(Keyword::Fun) => return,
                _ => (),
            }

            self.advance();
            if depth == 0 {
                return;
            }
        }
    }

    /// Descarta tokens hasta la siguiente declaración de función.
    fn synchronize_declaration(&mut self) {
        while !self.at_end() && !self.check(TokenKind::Keyword(Keyword::Fun)) {
            self.advance();
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Parse<&Token> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            let found = self.peek().clone();
            self.fail(ParserError::Expected {
                expected: kind,
                found,
            })
        }
    }

    fn matches(&mut self, kind: TokenKind) -> bool {
        let matches = self.check(kind);
        if matches {
            self.advance();
        }

        matches
    }

    fn check(&self, kind: TokenKind) -> bool {
        !self.at_end() && self.peek().kind() == kind
    }

    fn at_end(&self) -> bool {
        self.peek().kind() == TokenKind::Eof
    }

    fn peek(&self) -> &Token {
        self.tokens.get(self.current).unwrap_or(&self.eof)
    }

    fn advance(&mut self) -> &Token {
        if !self.at_end() {
            self.current += 1;
            return &self.tokens[self.current - 1];
        }

        self.peek()
    }

    fn fail<T>(&mut self, error: ParserError) -> Parse<T> {
        let location = self.peek().location();
        self.fail_at(error, location)
    }

    fn fail_at<T>(&mut self, error: ParserError, location: Location) -> Parse<T> {
        // Ya se reportó un error en esta sentencia
        if !self.panic {
            self.errors.push(Located::at(error, location));
        }

        self.panic = true;
        Err(Failure)
    }
}
