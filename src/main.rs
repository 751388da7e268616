//! Punto de entrada ("driver").
//!
//! Este módulo orquesta las diferentes fases del proceso de
//! compilación y expone una CLI. Los errores del programa fuente se
//! reportan como diagnósticos y terminan el proceso con estado 1; los
//! errores propios del driver (E/S, argumentos) se manejan con
//! `anyhow`.

use anyhow::{self, bail, Context};
use bitflags::bitflags;
use clap::{self, crate_version, Arg, ArgAction};
use funcc::{
    error::Diagnostics,
    ir::Module,
    lex::{Lexer, Token},
    parse::Parser,
    semantic,
    source::Source,
};

use log::{debug, LevelFilter, Log, Metadata, Record};

use std::{
    fs::File,
    io::{self, Write},
    process,
    rc::Rc,
};

bitflags! {
    /// Representaciones intermedias a mostrar en stderr.
    struct DumpOptions: u32 {
        const TOKENS = 1 << 0;
        const AST = 1 << 1;
        const IR = 1 << 2;
    }
}

fn main() -> anyhow::Result<()> {
    // Parsing de CLI
    let args = clap::Command::new("Fun compiler")
        .version(crate_version!())
        .arg(
            Arg::new("input")
                .value_name("INPUT")
                .required(true)
                .help("Source file ('-' for stdin)"),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .takes_value(true)
                .value_name("FILE")
                .default_value("-")
                .help("Output file for the IR listing ('-' for stdout)"),
        )
        .arg(
            Arg::new("dump-tokens")
                .long("dump-tokens")
                .help("Print the token stream to stderr"),
        )
        .arg(
            Arg::new("dump-ast")
                .long("dump-ast")
                .help("Print the syntax tree to stderr"),
        )
        .arg(
            Arg::new("dump-ir")
                .long("dump-ir")
                .help("Print the lowered module to stderr, even on failure"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .action(ArgAction::Count)
                .help("Increase log verbosity (repeatable)"),
        )
        .get_matches();

    // Se extraen argumentos necesarios
    let input = args.value_of("input").context("Missing input file")?;
    let output = args.value_of("output").unwrap_or("-");

    if input != "-" && input == output {
        bail!("Refusing to overwrite the input file: {}", input);
    }

    let mut dumps = DumpOptions::empty();
    for (flag, option) in [
        ("dump-tokens", DumpOptions::TOKENS),
        ("dump-ast", DumpOptions::AST),
        ("dump-ir", DumpOptions::IR),
    ] {
        if args.is_present(flag) {
            dumps |= option;
        }
    }

    init_logger(args.get_count("verbose"))?;

    let source = Rc::new(read_source(input)?);
    let module = match compile(&source, dumps) {
        Ok(module) => module,
        Err(diagnostics) => {
            eprint!("{}", diagnostics);
            process::exit(1);
        }
    };

    match output {
        "-" => {
            let mut stdout = io::stdout();
            write!(stdout, "{}", module).context("Failed to write to stdout")?;
        }

        path => {
            let mut file = File::create(path)
                .with_context(|| format!("Failed to open for writing: {}", path))?;

            write!(file, "{}", module)
                .with_context(|| format!("Failed to write to file: {}", path))?;
        }
    }

    Ok(())
}

fn read_source(input: &str) -> anyhow::Result<Source> {
    if input == "-" {
        return Source::read(io::stdin(), "<stdin>").context("Failed to read from stdin");
    }

    let file = File::open(input).with_context(|| format!("Failed to open: {}", input))?;
    Source::read(file, input).with_context(|| format!("Failed to read: {}", input))
}

/// Ejecuta las fases en orden, deteniéndose tras la primera que falle.
fn compile(source: &Rc<Source>, dumps: DumpOptions) -> Result<Module, Diagnostics> {
    let attach = |diagnostics: Diagnostics| diagnostics.with_source(Rc::clone(source));

    let tokens = Lexer::new(source.text())
        .try_exhaustive()
        .map_err(|errors| attach(errors.into()))?;

    debug!("Scanned {} token(s)", tokens.len());
    if dumps.contains(DumpOptions::TOKENS) {
        dump_tokens(&tokens);
    }

    let (ast, errors) = Parser::new(&tokens).parse_all();
    if dumps.contains(DumpOptions::AST) {
        eprint!("{}", ast);
    }

    if !errors.is_empty() {
        return Err(attach(errors.into()));
    }

    let mut module = Module::with_builtins();
    let result = semantic::lower(&ast, &mut module);

    if dumps.contains(DumpOptions::IR) {
        eprint!("{}", module);
    }

    result.map_err(|errors| attach(errors.into()))?;
    Ok(module)
}

fn dump_tokens(tokens: &[Token]) {
    for token in tokens {
        let location = token.location().to_string();
        let kind = token.kind().to_string();

        eprintln!("{:>8} {:<24} {}", location, kind, token.lexeme());
    }
}

/// Bitácora mínima hacia stderr.
struct StderrLogger;

static LOGGER: StderrLogger = StderrLogger;

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record<'_>) {
        if self.enabled(record.metadata()) {
            eprintln!("[{}] {}", record.level(), record.args());
        }
    }

    fn flush(&self) {}
}

fn init_logger(verbosity: u8) -> anyhow::Result<()> {
    let level = match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    log::set_logger(&LOGGER).context("Logger was already initialized")?;
    log::set_max_level(level);

    Ok(())
}
