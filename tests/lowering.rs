use funcc::{
    ir::{
        self, ArithOp, Block, Body, Cond, Constant, FunctionId, Instruction, Label, Local, Module,
        Signature, Slot, VerifyError,
    },
    lex::{Identifier, Lexer},
    parse,
    semantic::{self, SemanticError, Sink},
    source::{Located, Location},
};

fn lower(source: &str) -> (Module, Result<(), Vec<Located<SemanticError>>>) {
    let tokens = Lexer::new(source).try_exhaustive().expect("lexical error");
    let ast = parse::parse(&tokens).expect("syntax error");

    let mut module = Module::with_builtins();
    let result = semantic::lower(&ast, &mut module);

    (module, result)
}

fn lower_ok(source: &str) -> Module {
    let (module, result) = lower(source);
    result.expect("semantic error");

    for function in module.functions() {
        ir::verify(&module, function).expect("malformed function");
    }

    module
}

fn errors(source: &str) -> Vec<SemanticError> {
    let (_, result) = lower(source);
    result
        .expect_err("lowering should fail")
        .into_iter()
        .map(Located::into_inner)
        .collect()
}

fn body<'m>(module: &'m Module, name: &str) -> &'m Body {
    module
        .function(name)
        .and_then(|function| function.generated())
        .expect("no such generated function")
}

fn block<'b>(body: &'b Body, name: &str) -> &'b Block {
    let label = body.find_block(name).expect("no such block");
    body.block(label).unwrap()
}

fn id(name: &str) -> Identifier {
    Identifier::new(name)
}

#[test]
fn sum_of_parameters() {
    let module = lower_ok("fun f(a,b){ return a + b; }");

    let f = module.function("f").unwrap();
    assert_eq!(f.parameters(), ["a", "b"]);

    let body = body(&module, "f");
    assert_eq!(body.slots(), ["retvalue", "a", "b"]);

    let exit = body.find_block("exit").unwrap();
    assert_eq!(
        block(body, "entry").code(),
        [
            Instruction::Const(Constant::Number(0.0), Local(0)),
            Instruction::Store(Local(0), Slot(0)),
            Instruction::Param(0, Local(1)),
            Instruction::Store(Local(1), Slot(1)),
            Instruction::Param(1, Local(2)),
            Instruction::Store(Local(2), Slot(2)),
            Instruction::Load(Slot(1), Local(3)),
            Instruction::Load(Slot(2), Local(4)),
            Instruction::Arith {
                op: ArithOp::Add,
                left: Local(3),
                right: Local(4),
                output: Local(5),
            },
            Instruction::Store(Local(5), Slot(0)),
            Instruction::Jump(exit),
        ]
    );

    assert_eq!(
        block(body, "exit").code(),
        [
            Instruction::Load(Slot(0), Local(6)),
            Instruction::Return(Local(6)),
        ]
    );
}

#[test]
fn falling_off_the_end_returns_zero() {
    let module = lower_ok("fun f() { }");
    let body = body(&module, "f");

    assert_eq!(body.blocks().len(), 2);
    assert_eq!(
        block(body, "entry").code().last(),
        Some(&Instruction::Jump(Label(1)))
    );
}

#[test]
fn redeclaration_fails_the_function() {
    let source = "fun f() { var x = 1; var x = 2; }";
    let (module, result) = lower(source);

    let errors = result.unwrap_err();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].val(), &SemanticError::Redeclared(id("x")));
    assert_eq!(errors[0].location(), Location::new(1, 26));

    assert!(module.function("f").is_none());
    assert!(module.function("printd").is_some());
}

#[test]
fn shadowing_in_branch_keeps_outer_binding() {
    let module = lower_ok("fun f() { var x = 1; if (x) { var x = 2; } return x; }");
    let body = body(&module, "f");

    assert_eq!(body.slots(), ["retvalue", "x", "x"]);

    let merge = block(body, "ifcont");
    assert!(matches!(merge.code()[0], Instruction::Load(Slot(1), _)));
    assert!(matches!(merge.code()[1], Instruction::Store(_, Slot(0))));
}

#[test]
fn return_in_branch_skips_merge() {
    let module = lower_ok("fun f(a) { if (a) { return 1; } else { a = 2; } return a; }");
    let body = body(&module, "f");

    let exit = body.find_block("exit").unwrap();
    let merge = body.find_block("ifcont").unwrap();

    assert_eq!(
        block(body, "then").terminator(),
        Some(&Instruction::Jump(exit))
    );

    assert_eq!(
        block(body, "else").terminator(),
        Some(&Instruction::Jump(merge))
    );

    assert_eq!(
        block(body, "ifcont").terminator(),
        Some(&Instruction::Jump(exit))
    );
}

#[test]
fn condition_is_compared_against_zero() {
    let module = lower_ok("fun f(a) { if (a) { a = 1; } return a; }");
    let entry = block(body(&module, "f"), "entry");

    let code = entry.code();
    let n = code.len();

    let zero = match &code[n - 3] {
        Instruction::Const(Constant::Number(value), zero) if *value == 0.0 => *zero,
        other => panic!("expected zero constant, found {:?}", other),
    };

    let test = match &code[n - 2] {
        Instruction::Compare {
            cond: Cond::NotEqual,
            right,
            output,
            ..
        } if *right == zero => *output,
        other => panic!("expected comparison, found {:?}", other),
    };

    assert!(matches!(
        code[n - 1],
        Instruction::Branch { condition, .. } if condition == test
    ));
}

#[test]
fn comparisons_are_widened() {
    let module = lower_ok("fun lt(a, b) { return a < b; }");
    let code = block(body(&module, "lt"), "entry").code();

    let position = code
        .iter()
        .position(|instruction| {
            matches!(
                instruction,
                Instruction::Compare {
                    cond: Cond::Less,
                    ..
                }
            )
        })
        .expect("no comparison");

    let flag = code[position].output().unwrap();
    let widened = match code[position + 1] {
        Instruction::Widen(value, output) if value == flag => output,
        ref other => panic!("expected widening, found {:?}", other),
    };

    assert_eq!(
        code[position + 2],
        Instruction::Store(widened, Slot(0))
    );
}

#[test]
fn call_errors_fail_only_their_function() {
    let source = "
        fun g() { return h(1); }
        fun k() { return printd(1, 2); }
        fun ok() { return printd(3); }
    ";

    let (module, result) = lower(source);
    let errors: Vec<_> = result.unwrap_err().into_iter().map(Located::into_inner).collect();

    assert_eq!(
        errors,
        [
            SemanticError::UnknownFunction(id("h")),
            SemanticError::ArgumentCount {
                function: id("printd"),
                expected: 1,
                found: 2,
            },
        ]
    );

    assert!(module.function("g").is_none());
    assert!(module.function("k").is_none());

    let ok = module.function("ok").unwrap();
    assert!(ir::verify(&module, ok).is_ok());
}

#[test]
fn callees_must_be_declared_first() {
    let errors = errors("fun a() { return b(); } fun b() { return 1; }");
    assert_eq!(errors, [SemanticError::UnknownFunction(id("b"))]);
}

#[test]
fn recursion() {
    let module = lower_ok("fun fact(n) { if (n < 2) { return 1; } return n * fact(n - 1); }");
    let body = body(&module, "fact");

    let calls: Vec<_> = body
        .blocks()
        .iter()
        .flat_map(|block| block.code())
        .filter_map(|instruction| match instruction {
            Instruction::Call { target, .. } => Some(target.as_str()),
            _ => None,
        })
        .collect();

    assert_eq!(calls, ["fact"]);
}

#[test]
fn undeclared_variable() {
    let (_, result) = lower("fun f() { return y; }");
    let errors = result.unwrap_err();

    assert_eq!(errors[0].val(), &SemanticError::Undeclared(id("y")));
    assert_eq!(errors[0].location(), Location::new(1, 18));
}

#[test]
fn redefinition() {
    let (module, result) = lower("fun f() { return 1; } fun f() { return 2; }");

    assert_eq!(
        result.unwrap_err()[0].val(),
        &SemanticError::Redefinition(id("f"))
    );

    // La primera definición sobrevive
    assert!(module.function("f").unwrap().generated().is_some());
}

#[test]
fn builtin_declaration_is_not_redefinable_with_other_arity() {
    let errors = errors("fun printd(a, b) { return a; }");
    assert_eq!(errors, [SemanticError::Redefinition(id("printd"))]);
}

#[test]
fn strings_cannot_be_stored() {
    assert_eq!(
        errors("fun f() { var s: string = \"hi\"; }"),
        [SemanticError::StringAssignment(id("s"))]
    );

    assert_eq!(
        errors("fun f() { var s = \"hi\"; }"),
        [SemanticError::StringAssignment(id("s"))]
    );

    assert_eq!(
        errors("fun f(a) { a = \"hi\"; }"),
        [SemanticError::StringAssignment(id("a"))]
    );
}

#[test]
fn strings_are_not_numbers() {
    assert_eq!(
        errors("fun f() { return \"hi\"; }"),
        [SemanticError::ExpectedNumber]
    );

    assert_eq!(
        errors("fun f() { return (\"hi\") + 1; }"),
        [SemanticError::ExpectedNumber]
    );

    assert_eq!(
        errors("fun f() { return printd(\"hi\"); }"),
        [SemanticError::ExpectedNumber]
    );
}

#[test]
fn string_statements_are_opaque_constants() {
    let module = lower_ok("fun f() { \"hello\"; return 1; }");
    let code = block(body(&module, "f"), "entry").code();

    assert!(code.iter().any(|instruction| matches!(
        instruction,
        Instruction::Const(Constant::Str(string), _) if &**string == "hello"
    )));
}

#[test]
fn declaration_without_value_is_zero() {
    let module = lower_ok("fun f() { var x; return x; }");
    let code = block(body(&module, "f"), "entry").code();

    assert_eq!(code[2], Instruction::Const(Constant::Number(0.0), Local(1)));
    assert_eq!(code[3], Instruction::Store(Local(1), Slot(1)));
}

#[test]
fn nested_conditionals_continue_at_inner_merge() {
    let module = lower_ok("fun f(a) { if (a) { if (a) { a = 1; } a = 2; } return a; }");
    let body = body(&module, "f");

    // entry, exit, y dos tripletas then/else/ifcont
    assert_eq!(body.blocks().len(), 8);

    let outer_merge = body.find_block("ifcont").unwrap();
    let inner_merge = Label(7);
    assert_eq!(body.block(inner_merge).unwrap().name(), "ifcont");

    // La asignación posterior al `if` interno ocurre en su bloque de unión
    let inner = body.block(inner_merge).unwrap();
    assert!(inner
        .code()
        .iter()
        .any(|instruction| matches!(instruction, Instruction::Store(_, Slot(1)))));

    assert_eq!(inner.terminator(), Some(&Instruction::Jump(outer_merge)));
}

#[test]
fn failed_functions_do_not_affect_siblings() {
    let source = "
        fun bad(a) { if (a) { var a = 1; var a = 2; } return a; }
        fun good(a) { if (a) { var a = 1; } return a; }
    ";

    let (module, result) = lower(source);
    assert_eq!(result.unwrap_err().len(), 1);

    assert!(module.function("bad").is_none());
    let good = module.function("good").unwrap();
    assert!(ir::verify(&module, good).is_ok());
}

#[test]
fn listing() {
    let module = lower_ok("fun add(a, b) { return a + b; }");
    let listing = module.to_string();

    assert!(listing.starts_with("declare printd(x)\n"));
    assert!(listing.contains("define add(a, b) {\n"));
    assert!(listing.contains("  %5 = fadd %3, %4\n"));
    assert!(listing.contains("  br exit.1\n"));
    assert!(listing.contains("  ret %6\n"));
}

#[test]
fn unordered_relations_in_listing() {
    let module = lower_ok("fun f(a, b) { return (a < b) + (a >= b) + (a == b) + (a != b); }");
    let listing = module.to_string();

    assert!(listing.contains(" = fcmp ult %"));
    assert!(listing.contains(" = fcmp uge %"));
    assert!(listing.contains(" = fcmp oeq %"));
    assert!(listing.contains(" = fcmp one %"));
}

/// Backend que delega en un [`Module`], pero cuya verificación rechaza
/// una función en particular.
struct Rejecting {
    module: Module,
    rejected: &'static str,
}

impl Sink for Rejecting {
    fn declare_function(&mut self, name: &str, parameters: &[&str]) -> FunctionId {
        self.module.declare_function(name, parameters)
    }

    fn lookup_function(&self, name: &str) -> Option<Signature> {
        self.module.lookup_function(name)
    }

    fn remove_function(&mut self, function: FunctionId) {
        self.module.remove_function(function)
    }

    fn verify_function(&self, function: FunctionId) -> Result<(), VerifyError> {
        match self.module.functions().get(function.0 as usize) {
            Some(target) if target.name() == self.rejected => {
                Err(VerifyError::MissingTerminator("exit".to_owned()))
            }

            _ => self.module.verify_function(function),
        }
    }

    fn create_block(&mut self, function: FunctionId, name: &str) -> Label {
        self.module.create_block(function, name)
    }

    fn position_at(&mut self, function: FunctionId, block: Label) {
        self.module.position_at(function, block)
    }

    fn parameter(&mut self, index: u32) -> Local {
        self.module.parameter(index)
    }

    fn alloc_slot(&mut self, name: &str) -> Slot {
        self.module.alloc_slot(name)
    }

    fn load(&mut self, slot: Slot) -> Local {
        self.module.load(slot)
    }

    fn store(&mut self, value: Local, slot: Slot) {
        self.module.store(value, slot)
    }

    fn constant(&mut self, constant: Constant) -> Local {
        self.module.constant(constant)
    }

    fn arith(&mut self, op: ArithOp, left: Local, right: Local) -> Local {
        self.module.arith(op, left, right)
    }

    fn compare(&mut self, cond: Cond, left: Local, right: Local) -> Local {
        self.module.compare(cond, left, right)
    }

    fn widen(&mut self, value: Local) -> Local {
        self.module.widen(value)
    }

    fn call(&mut self, function: FunctionId, arguments: Vec<Local>) -> Local {
        self.module.call(function, arguments)
    }

    fn jump(&mut self, target: Label) {
        self.module.jump(target)
    }

    fn branch(&mut self, condition: Local, then: Label, otherwise: Label) {
        self.module.branch(condition, then, otherwise)
    }

    fn ret(&mut self, value: Local) {
        self.module.ret(value)
    }
}

#[test]
fn verification_failure_removes_the_function() {
    let source = "
        fun first() { return 1; }
        fun rejected(a) { return a; }
        fun last() { return printd(first()); }
    ";

    let tokens = Lexer::new(source).try_exhaustive().expect("lexical error");
    let ast = parse::parse(&tokens).expect("syntax error");

    let mut sink = Rejecting {
        module: Module::with_builtins(),
        rejected: "rejected",
    };

    let errors = semantic::lower(&ast, &mut sink).unwrap_err();
    assert_eq!(errors.len(), 1);
    assert_eq!(
        errors[0].val(),
        &SemanticError::Verification {
            function: id("rejected"),
            reason: VerifyError::MissingTerminator("exit".to_owned()),
        }
    );

    assert_eq!(errors[0].location(), Location::new(3, 13));

    let module = sink.module;
    let names: Vec<_> = module.functions().iter().map(|f| f.name()).collect();
    assert_eq!(names, ["printd", "first", "last"]);

    for function in module.functions() {
        assert!(ir::verify(&module, function).is_ok());
    }
}
