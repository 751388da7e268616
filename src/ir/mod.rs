//! Representación intermedia por bloques básicos.
//!
//! Un [`Module`] contiene funciones, cada una de las cuales es externa
//! (solamente una firma) o generada. Las funciones generadas se componen
//! de bloques básicos, espacios de almacenamiento mutable (slots) y
//! valores inmutables numerados en orden de definición. Cada bloque
//! termina en exactamente una instrucción terminadora.
//!
//! El módulo implementa [`crate::semantic::Sink`] en [`build`] y puede
//! validarse con [`verify`].

use std::{
    fmt::{self, Display},
    rc::Rc,
};

mod build;
mod verify;

pub use verify::{verify, VerifyError};

/// Nombre del bloque de entrada de toda función generada.
pub const ENTRY: &str = "entry";

/// Unidad de compilación completa.
#[derive(Default)]
pub struct Module {
    functions: Vec<Function>,
    cursor: Cursor,
}

/// Punto de inserción actual del constructor.
#[derive(Copy, Clone, Default)]
struct Cursor {
    function: usize,
    block: usize,
}

impl Module {
    /// Construye un módulo vacío.
    pub fn new() -> Self {
        Module::default()
    }

    /// Construye un módulo con las funciones externas predefinidas.
    pub fn with_builtins() -> Self {
        let mut module = Module::new();
        module.functions.push(Function::external("printd", &["x"]));

        module
    }

    pub fn functions(&self) -> &[Function] {
        &self.functions
    }

    /// Busca una función por nombre.
    pub fn function(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|function| function.name == name)
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.functions.iter().position(|function| function.name == name)
    }
}

/// Referencia a una función de un [`Module`].
///
/// Las referencias son índices y se invalidan al remover funciones.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FunctionId(pub u32);

/// Firma de una función ya declarada.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Signature {
    pub id: FunctionId,
    pub arity: usize,
    pub defined: bool,
}

pub struct Function {
    name: String,
    parameters: Vec<String>,
    body: FunctionBody,
}

pub enum FunctionBody {
    External,
    Generated(Body),
}

impl Function {
    fn external(name: &str, parameters: &[&str]) -> Self {
        Function {
            name: name.to_owned(),
            parameters: parameters.iter().map(|&name| name.to_owned()).collect(),
            body: FunctionBody::External,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parameters(&self) -> &[String] {
        &self.parameters
    }

    pub fn arity(&self) -> usize {
        self.parameters.len()
    }

    pub fn body(&self) -> &FunctionBody {
        &self.body
    }

    /// Obtiene el cuerpo, si la función no es externa.
    pub fn generated(&self) -> Option<&Body> {
        match &self.body {
            FunctionBody::External => None,
            FunctionBody::Generated(body) => Some(body),
        }
    }

    pub fn is_external(&self) -> bool {
        matches!(self.body, FunctionBody::External)
    }
}

/// Cuerpo de una función generada.
#[derive(Default)]
pub struct Body {
    blocks: Vec<Block>,
    slots: Vec<String>,
    values: Vec<ValueType>,
}

impl Body {
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Nombres de los slots, indexados por [`Slot`].
    pub fn slots(&self) -> &[String] {
        &self.slots
    }

    /// Tipo de cada valor, indexado por [`Local`].
    pub fn values(&self) -> &[ValueType] {
        &self.values
    }

    pub fn block(&self, label: Label) -> Option<&Block> {
        self.blocks.get(label.0 as usize)
    }

    /// Busca el primer bloque con un nombre dado.
    pub fn find_block(&self, name: &str) -> Option<Label> {
        self.blocks
            .iter()
            .position(|block| block.name == name)
            .map(|index| Label(index as u32))
    }

    /// Tipo de un valor, si existe.
    pub fn type_of(&self, local: Local) -> Option<ValueType> {
        self.values.get(local.0 as usize).copied()
    }

    fn define(&mut self, typ: ValueType) -> Local {
        self.values.push(typ);
        Local(self.values.len() as u32 - 1)
    }
}

pub struct Block {
    name: String,
    code: Vec<Instruction>,
}

impl Block {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn code(&self) -> &[Instruction] {
        &self.code
    }

    /// Obtiene la instrucción final del bloque, si es terminadora.
    pub fn terminator(&self) -> Option<&Instruction> {
        self.code.last().filter(|instruction| instruction.is_terminator())
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Label(pub u32);

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Local(pub u32);

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Slot(pub u32);

/// Tipo de un valor inmutable.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ValueType {
    Number,
    Bool,
    Str,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Constant {
    Number(f64),
    Str(Rc<str>),
}

impl Constant {
    pub fn typ(&self) -> ValueType {
        match self {
            Constant::Number(_) => ValueType::Number,
            Constant::Str(_) => ValueType::Str,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
}

/// Condición de comparación entre flotantes.
///
/// La igualdad y la desigualdad son ordenadas: son falsas si algún
/// operando es NaN. Las relaciones de orden no lo son, y resultan
/// verdaderas ante un NaN.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Cond {
    Equal,
    NotEqual,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Instruction {
    Const(Constant, Local),
    Param(u32, Local),
    Load(Slot, Local),
    Store(Local, Slot),
    Arith {
        op: ArithOp,
        left: Local,
        right: Local,
        output: Local,
    },
    Compare {
        cond: Cond,
        left: Local,
        right: Local,
        output: Local,
    },
    Widen(Local, Local),
    Call {
        target: String,
        arguments: Vec<Local>,
        output: Local,
    },
    Jump(Label),
    Branch {
        condition: Local,
        then: Label,
        otherwise: Label,
    },
    Return(Local),
}

impl Instruction {
    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            Instruction::Jump(_) | Instruction::Branch { .. } | Instruction::Return(_)
        )
    }

    /// Valor que la instrucción define, si alguno.
    pub fn output(&self) -> Option<Local> {
        use Instruction::*;

        match self {
            Const(_, output) | Param(_, output) | Load(_, output) | Widen(_, output) => {
                Some(*output)
            }

            Arith { output, .. } | Compare { output, .. } | Call { output, .. } => Some(*output),
            Store(..) | Jump(_) | Branch { .. } | Return(_) => None,
        }
    }

    /// Valores que la instrucción consume.
    pub fn inputs(&self) -> Vec<Local> {
        use Instruction::*;

        match self {
            Const(..) | Param(..) | Load(..) | Jump(_) => Vec::new(),
            Store(value, _) | Widen(value, _) | Return(value) => vec![*value],
            Arith { left, right, .. } | Compare { left, right, .. } => vec![*left, *right],
            Call { arguments, .. } => arguments.clone(),
            Branch { condition, .. } => vec![*condition],
        }
    }

    /// Bloques a los que la instrucción puede transferir control.
    pub fn successors(&self) -> Vec<Label> {
        match self {
            Instruction::Jump(label) => vec![*label],
            Instruction::Branch {
                then, otherwise, ..
            } => vec![*then, *otherwise],
            _ => Vec::new(),
        }
    }
}

impl Display for Module {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, function) in self.functions.iter().enumerate() {
            if index > 0 {
                writeln!(fmt)?;
            }

            write!(fmt, "{}", function)?;
        }

        Ok(())
    }
}

impl Display for Function {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let body = match &self.body {
            FunctionBody::External => {
                return writeln!(fmt, "declare {}({})", self.name, self.parameters.join(", "))
            }

            FunctionBody::Generated(body) => body,
        };

        writeln!(fmt, "define {}({}) {{", self.name, self.parameters.join(", "))?;
        for (index, name) in body.slots.iter().enumerate() {
            writeln!(fmt, "  {} = slot {}", Slot(index as u32), name)?;
        }

        for (index, block) in body.blocks.iter().enumerate() {
            writeln!(fmt, "{}.{}:", block.name, index)?;
            for instruction in &block.code {
                writeln!(fmt, "  {}", Listing(instruction, body))?;
            }
        }

        writeln!(fmt, "}}")
    }
}

/// Instrucción junto al cuerpo que permite nombrar sus bloques.
struct Listing<'a>(&'a Instruction, &'a Body);

impl Display for Listing<'_> {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Instruction::*;

        let Listing(instruction, body) = self;
        let label = |label: &Label| match body.block(*label) {
            Some(block) => format!("{}.{}", block.name, label.0),
            None => format!("?.{}", label.0),
        };

        match instruction {
            Const(Constant::Number(number), output) => write!(fmt, "{} = const {:?}", output, number),
            Const(Constant::Str(string), output) => write!(fmt, "{} = const {:?}", output, string),
            Param(index, output) => write!(fmt, "{} = param {}", output, index),
            Load(slot, output) => write!(fmt, "{} = load {}", output, slot),
            Store(value, slot) => write!(fmt, "store {}, {}", value, slot),

            Arith {
                op,
                left,
                right,
                output,
            } => write!(fmt, "{} = {} {}, {}", output, op, left, right),

            Compare {
                cond,
                left,
                right,
                output,
            } => write!(fmt, "{} = fcmp {} {}, {}", output, cond, left, right),

            Widen(value, output) => write!(fmt, "{} = widen {}", output, value),

            Call {
                target,
                arguments,
                output,
            } => {
                write!(fmt, "{} = call {}(", output, target)?;
                for (index, argument) in arguments.iter().enumerate() {
                    if index > 0 {
                        fmt.write_str(", ")?;
                    }

                    write!(fmt, "{}", argument)?;
                }

                fmt.write_str(")")
            }

            Jump(target) => write!(fmt, "br {}", label(target)),

            Branch {
                condition,
                then,
                otherwise,
            } => write!(
                fmt,
                "br {}, {}, {}",
                condition,
                label(then),
                label(otherwise)
            ),

            Return(value) => write!(fmt, "ret {}", value),
        }
    }
}

impl Display for Local {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(fmt, "%{}", self.0)
    }
}

impl Display for Slot {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(fmt, "${}", self.0)
    }
}

impl Display for Label {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(fmt, "#{}", self.0)
    }
}

impl Display for ValueType {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Number => fmt.write_str("number"),
            ValueType::Bool => fmt.write_str("bool"),
            ValueType::Str => fmt.write_str("string"),
        }
    }
}

impl Display for ArithOp {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ArithOp::Add => "fadd",
            ArithOp::Sub => "fsub",
            ArithOp::Mul => "fmul",
            ArithOp::Div => "fdiv",
        };

        fmt.write_str(name)
    }
}

impl Display for Cond {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Cond::Equal => "oeq",
            Cond::NotEqual => "one",
            Cond::Less => "ult",
            Cond::LessOrEqual => "ule",
            Cond::Greater => "ugt",
            Cond::GreaterOrEqual => "uge",
        };

        fmt.write_str(name)
    }
}
