use std::rc::Rc;

use funcc::{
    ast::NodeKind,
    compile,
    error::Diagnostics,
    ir::Module,
    lex::{Lexer, LexerError, Token, TokenKind},
    parse::{self, Parser, ParserError},
    source::{Located, Location, Source},
};

const PROGRAM: &str = "\
fun max(a, b) {
  if (a > b) {
    return a;
  } else {
    return b;
  }
}

// Imprime y retorna
fun main() {
  var limit: number = 10;
  var i = 0;
  printd(max(i, limit) / 2.5);
  return i == limit;
}
";

fn tokens(source: &str) -> Vec<Token> {
    Lexer::new(source).try_exhaustive().expect("lexical error")
}

#[test]
fn token_stream_ends_in_eof() {
    let tokens = tokens(PROGRAM);

    let eofs = tokens
        .iter()
        .filter(|token| token.kind() == TokenKind::Eof)
        .count();

    assert_eq!(eofs, 1);
    assert_eq!(tokens.last().unwrap().kind(), TokenKind::Eof);
    assert_eq!(tokens.last().unwrap().lexeme(), "");
}

#[test]
fn lexemes_survive_a_round_trip() {
    let first = tokens(PROGRAM);

    let joined = first
        .iter()
        .map(Token::lexeme)
        .collect::<Vec<_>>()
        .join(" ");

    let second = tokens(&joined);
    let project = |tokens: &[Token]| {
        tokens
            .iter()
            .map(|token| (token.kind(), token.lexeme().to_owned()))
            .collect::<Vec<_>>()
    };

    assert_eq!(project(&first), project(&second));
}

#[test]
fn lines_are_tracked() {
    let tokens = tokens(PROGRAM);
    let main = tokens
        .iter()
        .find(|token| token.lexeme() == "main")
        .unwrap();

    assert_eq!(main.location(), Location::new(10, 5));
    assert_eq!(main.line(), 10);
}

#[test]
fn every_lexical_error_is_reported() {
    let errors = Lexer::new("fun f() {\n  var x = 1 # 2;\n  $\n}")
        .try_exhaustive()
        .unwrap_err();

    let errors: Vec<_> = errors.into_iter().map(Located::split).collect();
    assert_eq!(
        errors,
        [
            (Location::new(2, 13), LexerError::UnexpectedChar('#')),
            (Location::new(3, 3), LexerError::UnexpectedChar('$')),
        ]
    );
}

#[test]
fn program_structure() {
    let ast = parse::parse(&tokens(PROGRAM)).expect("syntax error");
    assert_eq!(ast.len(), 2);

    let max = &ast.functions()[0];
    assert_eq!(max.prototype().name().val().as_ref(), "max");
    assert_eq!(max.prototype().parameters().len(), 2);
    assert_eq!(max.body().len(), 1);
    assert_eq!(max.body()[0].kind(), NodeKind::If);

    let main = &ast.functions()[1];
    let kinds: Vec<_> = main.body().iter().map(|node| node.kind()).collect();
    assert_eq!(
        kinds,
        [
            NodeKind::Assign,
            NodeKind::Assign,
            NodeKind::Call,
            NodeKind::Return
        ]
    );

    assert_eq!(
        main.body()[2].to_string(),
        "(call printd (/ (call max i limit) 2.5))"
    );
}

#[test]
fn recovery_keeps_clean_functions() {
    let source = "
        fun broken() { var = 1; return 2; }
        fun fine(x) { return x * 2; }
        fun also_broken() { return (1 + ; }
    ";

    let (ast, errors) = Parser::new(&tokens(source)).parse_all();

    assert_eq!(errors.len(), 2);
    assert!(matches!(
        errors[0].val(),
        ParserError::Expected {
            expected: TokenKind::Identifier,
            ..
        }
    ));

    assert!(matches!(errors[1].val(), ParserError::ExpectedExpr(_)));

    assert_eq!(ast.len(), 1);
    assert_eq!(ast.functions()[0].prototype().name().val().as_ref(), "fine");
}

#[test]
fn pipeline_produces_a_verified_module() {
    let source = Rc::new(Source::new("max.fun", PROGRAM));
    let mut module = Module::with_builtins();

    compile(source, &mut module).expect("compilation failed");

    let names: Vec<_> = module.functions().iter().map(|f| f.name()).collect();
    assert_eq!(names, ["printd", "max", "main"]);
}

#[test]
fn diagnostics_show_the_offending_line() {
    let source = Rc::new(Source::new("bad.fun", "fun f() {\n  return y;\n}\n"));
    let mut module = Module::with_builtins();

    let diagnostics = compile(source, &mut module).unwrap_err();
    assert_eq!(diagnostics.len(), 1);

    let expected = "\
error: Variable `y` is not declared
 --> bad.fun:2:10
  |
2 |   return y;
  |          ^

Build failed with 1 error
";

    assert_eq!(diagnostics.to_string(), expected);
}

#[test]
fn diagnostics_without_source() {
    let error = Located::at(LexerError::UnterminatedString, Location::new(3, 4));
    let diagnostics = Diagnostics::from(error);

    assert_eq!(
        diagnostics.to_string(),
        "error: Unterminated string\n --> 3:4\n\nBuild failed with 1 error\n"
    );
}

#[test]
fn syntax_errors_stop_before_lowering() {
    let source = Rc::new(Source::new("bad.fun", "fun f() { x = ; }\nfun g() { 1 = 2; }"));
    let mut module = Module::with_builtins();

    let diagnostics = compile(source, &mut module).unwrap_err();
    let rendered = diagnostics.to_string();

    assert_eq!(diagnostics.len(), 2);
    assert!(rendered.contains("error: Expected an expression, found `;`"));
    assert!(rendered.contains("error: Invalid assignment target"));
    assert!(rendered.ends_with("Build failed with 2 errors\n"));

    assert_eq!(module.functions().len(), 1);
}
