//! Reference backend: a small typed expression language.
//!
//! ```text
//! var x = 40
//! int y = x + 2;
//! y * 2
//! ```
//!
//! Declarations persist across submissions of a session. `argc()` and
//! `arg(i)` read the host arguments, and script pack globals resolve like
//! read-only variables.

mod parser;

use std::collections::HashMap;
use std::io::Write;

use indexmap::IndexMap;
use serde::Serialize;
use thiserror::Error;
use tracing::trace;

use self::parser::{parse, BinaryOp, Expr, Pos, Stmt, Type, UnaryOp};
use super::{Backend, BackendSession, Diagnostic, Submission, VariableBinding};
use crate::error::BoxError;
use crate::host::ScriptHostContext;
use crate::value::ScriptValue;

/// Errors raised while running calc code.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RuntimeFault {
    #[error("({line},{column}): division by zero")]
    DivisionByZero { line: usize, column: usize },

    #[error("({line},{column}): integer overflow")]
    Overflow { line: usize, column: usize },

    #[error("({line},{column}): argument index {index} out of range ({count} arguments)")]
    ArgumentOutOfRange {
        line: usize,
        column: usize,
        index: i64,
        count: usize,
    },
}

/// Backend for the calc language.
#[derive(Debug, Clone, Copy, Default)]
pub struct CalcBackend;

impl Backend for CalcBackend {
    type Session = CalcSession;

    fn create_session(&self, host: ScriptHostContext) -> Result<CalcSession, BoxError> {
        Ok(CalcSession::new(host))
    }
}

#[derive(Debug, Clone)]
struct Binding {
    name: String,
    ty: Type,
    value: ScriptValue,
}

/// A calc session: declared bindings plus the host context.
#[derive(Debug)]
pub struct CalcSession {
    host: ScriptHostContext,
    globals: IndexMap<String, ScriptValue>,
    bindings: Vec<Binding>,
    submissions: usize,
}

impl CalcSession {
    pub fn new(host: ScriptHostContext) -> Self {
        let globals = host.globals();
        Self {
            host,
            globals,
            bindings: Vec::new(),
            submissions: 0,
        }
    }

    /// Number of submissions executed so far.
    pub fn submissions(&self) -> usize {
        self.submissions
    }

    /// Current value of a binding or pack global.
    pub fn value(&self, name: &str) -> Option<&ScriptValue> {
        self.bindings
            .iter()
            .rev()
            .find(|b| b.name == name)
            .map(|b| &b.value)
            .or_else(|| self.globals.get(name))
    }

    fn scope(&self) -> HashMap<String, Type> {
        let mut scope: HashMap<String, Type> = self
            .globals
            .iter()
            .map(|(name, value)| (name.clone(), Type::of(value)))
            .collect();
        for binding in &self.bindings {
            scope.insert(binding.name.clone(), binding.ty);
        }
        scope
    }

    fn eval(&self, expr: &Expr) -> Result<ScriptValue, RuntimeFault> {
        match expr {
            Expr::Literal { value } => Ok(value.clone()),
            Expr::Name { name, .. } => Ok(self.value(name).cloned().unwrap_or_default()),
            Expr::Unary { op, operand, pos } => {
                let value = self.eval(operand)?;
                match (op, value) {
                    (UnaryOp::Neg, ScriptValue::Int(v)) => {
                        v.checked_neg().map(ScriptValue::Int).ok_or(overflow(*pos))
                    }
                    (UnaryOp::Neg, ScriptValue::Double(v)) => Ok(ScriptValue::Double(-v)),
                    (UnaryOp::Not, ScriptValue::Bool(v)) => Ok(ScriptValue::Bool(!v)),
                    (_, other) => Ok(other),
                }
            }
            Expr::Binary { op, lhs, rhs, pos } => {
                let lhs = self.eval(lhs)?;
                let rhs = self.eval(rhs)?;
                binary(*op, lhs, rhs, *pos)
            }
            Expr::Call {
                function,
                args,
                pos,
            } => match function.as_str() {
                "argc" => Ok(ScriptValue::Int(self.host.args().len() as i64)),
                _ => {
                    let index = match args.first().map(|a| self.eval(a)).transpose()? {
                        Some(ScriptValue::Int(i)) => i,
                        _ => 0,
                    };
                    usize::try_from(index)
                        .ok()
                        .and_then(|i| self.host.arg(i))
                        .map(ScriptValue::from)
                        .ok_or(RuntimeFault::ArgumentOutOfRange {
                            line: pos.line,
                            column: pos.column,
                            index,
                            count: self.host.args().len(),
                        })
                }
            },
        }
    }
}

fn overflow(pos: Pos) -> RuntimeFault {
    RuntimeFault::Overflow {
        line: pos.line,
        column: pos.column,
    }
}

fn as_double(value: &ScriptValue) -> f64 {
    match value {
        ScriptValue::Int(v) => *v as f64,
        ScriptValue::Double(v) => *v,
        _ => 0.0,
    }
}

fn binary(
    op: BinaryOp,
    lhs: ScriptValue,
    rhs: ScriptValue,
    pos: Pos,
) -> Result<ScriptValue, RuntimeFault> {
    use ScriptValue::*;

    if op == BinaryOp::Add && (matches!(lhs, String(_)) || matches!(rhs, String(_))) {
        let text = |v: ScriptValue| match v {
            String(s) => s,
            other => other.to_string(),
        };
        return Ok(String(text(lhs) + &text(rhs)));
    }

    match op {
        BinaryOp::Eq => return Ok(Bool(values_equal(&lhs, &rhs))),
        BinaryOp::Ne => return Ok(Bool(!values_equal(&lhs, &rhs))),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let ordering = match (&lhs, &rhs) {
                (String(a), String(b)) => a.partial_cmp(b),
                (Int(a), Int(b)) => a.partial_cmp(b),
                _ => as_double(&lhs).partial_cmp(&as_double(&rhs)),
            };
            let result = ordering.is_some_and(|o| match op {
                BinaryOp::Lt => o.is_lt(),
                BinaryOp::Le => o.is_le(),
                BinaryOp::Gt => o.is_gt(),
                _ => o.is_ge(),
            });
            return Ok(Bool(result));
        }
        _ => {}
    }

    if let (Int(a), Int(b)) = (&lhs, &rhs) {
        let (a, b) = (*a, *b);
        if matches!(op, BinaryOp::Div | BinaryOp::Rem) && b == 0 {
            return Err(RuntimeFault::DivisionByZero {
                line: pos.line,
                column: pos.column,
            });
        }
        let result = match op {
            BinaryOp::Add => a.checked_add(b),
            BinaryOp::Sub => a.checked_sub(b),
            BinaryOp::Mul => a.checked_mul(b),
            BinaryOp::Div => a.checked_div(b),
            _ => a.checked_rem(b),
        };
        return result.map(Int).ok_or(overflow(pos));
    }

    let (a, b) = (as_double(&lhs), as_double(&rhs));
    Ok(Double(match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => a / b,
        _ => a % b,
    }))
}

fn values_equal(lhs: &ScriptValue, rhs: &ScriptValue) -> bool {
    match (lhs, rhs) {
        (ScriptValue::Int(_) | ScriptValue::Double(_), ScriptValue::Int(_) | ScriptValue::Double(_)) => {
            if let (ScriptValue::Int(a), ScriptValue::Int(b)) = (lhs, rhs) {
                a == b
            } else {
                as_double(lhs) == as_double(rhs)
            }
        }
        _ => lhs == rhs,
    }
}

/// Type checker for one submission against a session scope.
struct Checker {
    scope: HashMap<String, Type>,
    diagnostics: Vec<Diagnostic>,
}

impl Checker {
    fn error(&mut self, pos: Pos, message: impl Into<String>) -> Type {
        self.diagnostics
            .push(Diagnostic::error(pos.line, pos.column, message));
        Type::Void
    }

    fn check(&mut self, expr: &Expr) -> Type {
        match expr {
            Expr::Literal { value } => Type::of(value),
            Expr::Name { name, pos } => match self.scope.get(name) {
                Some(ty) => *ty,
                None => self.error(*pos, format!("the name `{}` does not exist in the current context", name)),
            },
            Expr::Unary { op, operand, pos } => {
                let ty = self.check(operand);
                match (op, ty) {
                    (_, Type::Void) => Type::Void,
                    (UnaryOp::Neg, t) if t.is_numeric() => t,
                    (UnaryOp::Not, Type::Bool) => Type::Bool,
                    (UnaryOp::Neg, t) => self.error(*pos, format!("operator `-` cannot be applied to `{}`", t.name())),
                    (UnaryOp::Not, t) => self.error(*pos, format!("operator `!` cannot be applied to `{}`", t.name())),
                }
            }
            Expr::Binary { op, lhs, rhs, pos } => {
                let l = self.check(lhs);
                let r = self.check(rhs);
                if l == Type::Void || r == Type::Void {
                    return Type::Void;
                }
                match op {
                    BinaryOp::Add if l == Type::String || r == Type::String => Type::String,
                    BinaryOp::Eq | BinaryOp::Ne if l == r || (l.is_numeric() && r.is_numeric()) => {
                        Type::Bool
                    }
                    BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge
                        if (l.is_numeric() && r.is_numeric())
                            || (l == Type::String && r == Type::String) =>
                    {
                        Type::Bool
                    }
                    BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem
                        if l.is_numeric() && r.is_numeric() =>
                    {
                        if l == Type::Int && r == Type::Int {
                            Type::Int
                        } else {
                            Type::Double
                        }
                    }
                    _ => self.error(
                        *pos,
                        format!(
                            "operator `{}` cannot be applied to `{}` and `{}`",
                            op.symbol(),
                            l.name(),
                            r.name()
                        ),
                    ),
                }
            }
            Expr::Call {
                function,
                args,
                pos,
            } => {
                let arg_types: Vec<Type> = args.iter().map(|a| self.check(a)).collect();
                match (function.as_str(), arg_types.as_slice()) {
                    ("argc", []) => Type::Int,
                    ("arg", [Type::Int]) => Type::String,
                    ("arg", [Type::Void]) => Type::Void,
                    ("argc", _) | ("arg", _) => {
                        self.error(*pos, format!("wrong arguments for `{}`", function))
                    }
                    _ => self.error(*pos, format!("unknown function `{}`", function)),
                }
            }
        }
    }
}

/// A declaration recorded in the symbol stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SymbolEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    pub line: usize,
    pub column: usize,
}

#[derive(Serialize)]
struct Image<'a> {
    format: &'static str,
    statements: &'a [Stmt],
}

#[derive(Serialize)]
struct Symbols<'a> {
    format: &'static str,
    symbols: &'a [SymbolEntry],
}

const IMAGE_FORMAT: &str = "calc-image/1";
const SYMBOLS_FORMAT: &str = "calc-symbols/1";

/// A type-checked calc submission.
#[derive(Debug, Clone)]
pub struct CalcSubmission {
    program: Vec<Stmt>,
    /// Resolved declared type per statement (`None` for expressions).
    declared: Vec<Option<Type>>,
    symbols: Vec<SymbolEntry>,
    warnings: Vec<Diagnostic>,
}

impl CalcSubmission {
    /// Declarations made by this submission.
    pub fn symbols(&self) -> &[SymbolEntry] {
        &self.symbols
    }
}

impl Submission for CalcSubmission {
    fn diagnostics(&self) -> &[Diagnostic] {
        &self.warnings
    }

    fn emit(&self, code: &mut dyn Write, symbols: &mut dyn Write) -> std::io::Result<()> {
        serde_json::to_writer_pretty(
            &mut *code,
            &Image {
                format: IMAGE_FORMAT,
                statements: &self.program,
            },
        )?;
        serde_json::to_writer_pretty(
            &mut *symbols,
            &Symbols {
                format: SYMBOLS_FORMAT,
                symbols: &self.symbols,
            },
        )?;
        code.flush()?;
        symbols.flush()
    }
}

impl BackendSession for CalcSession {
    type Submission = CalcSubmission;

    fn compile_submission(&mut self, source: &str) -> Result<CalcSubmission, Vec<Diagnostic>> {
        let program = parse(source)?;
        let mut checker = Checker {
            scope: self.scope(),
            diagnostics: Vec::new(),
        };
        let mut declared = Vec::with_capacity(program.len());
        let mut symbols = Vec::new();
        let mut warnings = Vec::new();
        let last = program.len().saturating_sub(1);

        for (index, stmt) in program.iter().enumerate() {
            match stmt {
                Stmt::Declare {
                    name,
                    annotation,
                    init,
                    pos,
                } => {
                    let inferred = checker.check(init);
                    let ty = match (annotation, inferred) {
                        (_, Type::Void) => Type::Void,
                        (None, t) => t,
                        (Some(a), t) if *a == t => t,
                        (Some(Type::Double), Type::Int) => Type::Double,
                        (Some(a), t) => checker.error(
                            *pos,
                            format!("cannot assign `{}` to `{}` variable `{}`", t.name(), a.name(), name),
                        ),
                    };
                    if ty != Type::Void {
                        checker.scope.insert(name.clone(), ty);
                        symbols.push(SymbolEntry {
                            name: name.clone(),
                            type_name: ty.name().to_string(),
                            line: pos.line,
                            column: pos.column,
                        });
                    }
                    declared.push(Some(ty));
                }
                Stmt::Expr {
                    expr,
                    terminated,
                    pos,
                } => {
                    checker.check(expr);
                    if index != last && !terminated {
                        if let Expr::Literal { .. } = expr {
                            warnings.push(Diagnostic::warning(
                                pos.line,
                                pos.column,
                                "literal value is discarded",
                            ));
                        }
                    }
                    declared.push(None);
                }
            }
        }

        if !checker.diagnostics.is_empty() {
            return Err(checker.diagnostics);
        }

        Ok(CalcSubmission {
            program,
            declared,
            symbols,
            warnings,
        })
    }

    fn execute(&mut self, submission: CalcSubmission) -> Result<ScriptValue, BoxError> {
        self.submissions += 1;
        let mut result = ScriptValue::Unit;

        for (stmt, declared) in submission.program.iter().zip(&submission.declared) {
            result = ScriptValue::Unit;
            match stmt {
                Stmt::Declare { name, init, .. } => {
                    let mut value = self.eval(init)?;
                    let ty = declared.unwrap_or_else(|| Type::of(&value));
                    if let (Type::Double, ScriptValue::Int(v)) = (ty, &value) {
                        value = ScriptValue::Double(*v as f64);
                    }
                    trace!(name = %name, ty = ty.name(), "declared binding");
                    self.bindings.push(Binding {
                        name: name.clone(),
                        ty,
                        value,
                    });
                }
                Stmt::Expr {
                    expr, terminated, ..
                } => {
                    let value = self.eval(expr)?;
                    if !terminated {
                        result = value;
                    }
                }
            }
        }

        Ok(result)
    }

    fn current_bindings(&self) -> Vec<VariableBinding> {
        self.bindings
            .iter()
            .map(|b| VariableBinding::new(b.name.clone(), b.ty.name()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{ScriptPack, StaticPack};
    use std::sync::Arc;

    fn session() -> CalcSession {
        CalcBackend.create_session(ScriptHostContext::default()).unwrap()
    }

    fn run(session: &mut CalcSession, source: &str) -> ScriptValue {
        let submission = session.compile_submission(source).unwrap();
        session.execute(submission).unwrap()
    }

    #[test]
    fn test_one_plus_one() {
        let mut s = session();
        assert_eq!(run(&mut s, "1+1"), ScriptValue::Int(2));
    }

    #[test]
    fn test_bindings_carry_forward() {
        let mut s = session();
        assert_eq!(run(&mut s, "var x = 1;"), ScriptValue::Unit);
        assert_eq!(run(&mut s, "x + 1"), ScriptValue::Int(2));
        assert_eq!(s.submissions(), 2);
    }

    #[test]
    fn test_undefined_name_is_compile_error() {
        let mut s = session();
        let diagnostics = s.compile_submission("x + 1").unwrap_err();
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].message.contains("`x`"));
    }

    #[test]
    fn test_compile_failure_leaves_bindings() {
        let mut s = session();
        run(&mut s, "var a = 1;");
        assert!(s.compile_submission("var b = 2; c").is_err());
        assert_eq!(s.current_bindings(), vec![VariableBinding::new("a", "int")]);
    }

    #[test]
    fn test_shadowing_reports_both() {
        let mut s = session();
        run(&mut s, "var x = 1; var x = \"one\"; var x = 2;");
        let names: Vec<_> = s.current_bindings().iter().map(VariableBinding::render).collect();
        assert_eq!(names, ["int x", "string x", "int x"]);
        assert_eq!(s.value("x"), Some(&ScriptValue::Int(2)));
    }

    #[test]
    fn test_typed_declarations() {
        let mut s = session();
        run(&mut s, "double d = 3; bool flag = 1 < 2;");
        assert_eq!(s.value("d"), Some(&ScriptValue::Double(3.0)));
        assert_eq!(s.value("flag"), Some(&ScriptValue::Bool(true)));

        let diagnostics = s.compile_submission("int n = \"text\"").unwrap_err();
        assert!(diagnostics[0].message.contains("cannot assign"));
    }

    #[test]
    fn test_type_errors() {
        let mut s = session();
        assert!(s.compile_submission("true * 2").is_err());
        assert!(s.compile_submission("!1").is_err());
        assert!(s.compile_submission("nope()").is_err());
    }

    #[test]
    fn test_string_concatenation() {
        let mut s = session();
        assert_eq!(run(&mut s, "\"n=\" + 4"), ScriptValue::from("n=4"));
    }

    #[test]
    fn test_division_by_zero_faults_after_partial_effects() {
        let mut s = session();
        let submission = s.compile_submission("var before = 1; 1 / 0").unwrap();
        let err = s.execute(submission).unwrap_err();
        assert!(err.to_string().contains("division by zero"));
        assert_eq!(s.current_bindings(), vec![VariableBinding::new("before", "int")]);
    }

    #[test]
    fn test_overflow_faults() {
        let mut s = session();
        let submission = s.compile_submission("9223372036854775807 + 1").unwrap();
        let err = s.execute(submission).unwrap_err();
        assert!(err.downcast_ref::<RuntimeFault>().is_some());
    }

    #[test]
    fn test_host_arguments() {
        let host = ScriptHostContext::new(["first", "second"], Vec::new());
        let mut s = CalcBackend.create_session(host).unwrap();
        assert_eq!(run(&mut s, "argc()"), ScriptValue::Int(2));
        assert_eq!(run(&mut s, "arg(1)"), ScriptValue::from("second"));

        let submission = s.compile_submission("arg(5)").unwrap();
        let err = s.execute(submission).unwrap_err();
        assert!(err.to_string().contains("out of range"));
    }

    #[test]
    fn test_pack_globals_are_not_bindings() {
        let pack: Arc<dyn ScriptPack> = Arc::new(StaticPack::new("math").global("answer", 42i64));
        let host = ScriptHostContext::new(Vec::<String>::new(), vec![pack]);
        let mut s = CalcBackend.create_session(host).unwrap();
        assert_eq!(run(&mut s, "answer / 2"), ScriptValue::Int(21));
        assert!(s.current_bindings().is_empty());
    }

    #[test]
    fn test_emit_writes_image_and_symbols() {
        let mut s = session();
        let submission = s.compile_submission("var x = 1\nstring y = \"a\"").unwrap();
        let mut code = Vec::new();
        let mut symbols = Vec::new();
        submission.emit(&mut code, &mut symbols).unwrap();

        let image: serde_json::Value = serde_json::from_slice(&code).unwrap();
        assert_eq!(image["format"], IMAGE_FORMAT);
        assert_eq!(image["statements"].as_array().unwrap().len(), 2);

        let table: serde_json::Value = serde_json::from_slice(&symbols).unwrap();
        assert_eq!(table["symbols"][1]["name"], "y");
        assert_eq!(table["symbols"][1]["type"], "string");
        assert_eq!(table["symbols"][1]["line"], 2);
        assert_eq!(submission.symbols().len(), 2);
        assert_eq!(submission.symbols()[0].type_name, "int");
    }

    #[test]
    fn test_deep_expression_is_diagnostic() {
        let mut s = session();
        let diagnostics = s
            .compile_submission(&vec!["1"; 20_000].join("+"))
            .unwrap_err();
        assert!(diagnostics[0].message.contains("nested too deeply"));
        assert!(s.current_bindings().is_empty());
    }

    #[test]
    fn test_discarded_literal_warning() {
        let mut s = session();
        let submission = s.compile_submission("5\n6").unwrap();
        assert_eq!(submission.diagnostics().len(), 1);
        assert!(!submission.diagnostics()[0].is_error());
    }
}
