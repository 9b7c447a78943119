//! Lexer and parser for calc submissions.

use serde::Serialize;

use crate::backend::Diagnostic;
use crate::value::ScriptValue;

/// Source position (1-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pos {
    pub line: usize,
    pub column: usize,
}

impl Pos {
    fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

/// Declared type of a binding or expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Type {
    Int,
    Double,
    String,
    Bool,
    Void,
}

impl Type {
    pub fn name(self) -> &'static str {
        match self {
            Self::Int => "int",
            Self::Double => "double",
            Self::String => "string",
            Self::Bool => "bool",
            Self::Void => "void",
        }
    }

    pub fn of(value: &ScriptValue) -> Self {
        match value {
            ScriptValue::Unit => Self::Void,
            ScriptValue::Bool(_) => Self::Bool,
            ScriptValue::Int(_) => Self::Int,
            ScriptValue::Double(_) => Self::Double,
            ScriptValue::String(_) => Self::String,
        }
    }

    fn from_keyword(word: &str) -> Option<Self> {
        match word {
            "int" => Some(Self::Int),
            "double" => Some(Self::Double),
            "string" => Some(Self::String),
            "bool" => Some(Self::Bool),
            _ => None,
        }
    }

    pub fn is_numeric(self) -> bool {
        matches!(self, Self::Int | Self::Double)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Rem => "%",
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Expr {
    Literal {
        value: ScriptValue,
    },
    Name {
        name: String,
        pos: Pos,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
        pos: Pos,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
        pos: Pos,
    },
    Call {
        function: String,
        args: Vec<Expr>,
        pos: Pos,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Stmt {
    /// `var x = ...` (no annotation) or `int x = ...`.
    Declare {
        name: String,
        annotation: Option<Type>,
        init: Expr,
        pos: Pos,
    },
    Expr {
        expr: Expr,
        /// Ended with `;`, which discards the value.
        terminated: bool,
        pos: Pos,
    },
}

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Int(i64),
    Double(f64),
    Str(String),
    Ident(String),
    Op(&'static str),
    LParen,
    RParen,
    Comma,
    Semi,
    Newline,
    Eof,
}

impl Tok {
    fn describe(&self) -> String {
        match self {
            Self::Int(v) => v.to_string(),
            Self::Double(v) => v.to_string(),
            Self::Str(_) => "string literal".to_string(),
            Self::Ident(name) => format!("`{}`", name),
            Self::Op(op) => format!("`{}`", op),
            Self::LParen => "`(`".to_string(),
            Self::RParen => "`)`".to_string(),
            Self::Comma => "`,`".to_string(),
            Self::Semi => "`;`".to_string(),
            Self::Newline => "end of line".to_string(),
            Self::Eof => "end of input".to_string(),
        }
    }
}

const OPERATORS: [&str; 13] = [
    "==", "!=", "<=", ">=", "<", ">", "+", "-", "*", "/", "%", "!", "=",
];

fn lex(source: &str, diagnostics: &mut Vec<Diagnostic>) -> Vec<(Tok, Pos)> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    let mut line = 1;
    let mut col = 1;
    let mut depth = 0usize;

    while i < chars.len() {
        let c = chars[i];
        let pos = Pos::new(line, col);

        if c == '\n' {
            if depth == 0 {
                tokens.push((Tok::Newline, pos));
            }
            i += 1;
            line += 1;
            col = 1;
            continue;
        }
        if c.is_whitespace() {
            i += 1;
            col += 1;
            continue;
        }
        // Line comment
        if c == '/' && chars.get(i + 1) == Some(&'/') {
            while i < chars.len() && chars[i] != '\n' {
                i += 1;
            }
            continue;
        }

        if c.is_ascii_digit() {
            let start = i;
            while i < chars.len() && chars[i].is_ascii_digit() {
                i += 1;
            }
            let mut is_double = false;
            if i + 1 < chars.len() && chars[i] == '.' && chars[i + 1].is_ascii_digit() {
                is_double = true;
                i += 1;
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
            }
            let text: String = chars[start..i].iter().collect();
            col += i - start;
            let tok = if is_double {
                text.parse().map(Tok::Double).ok()
            } else {
                text.parse().map(Tok::Int).ok()
            };
            match tok {
                Some(tok) => tokens.push((tok, pos)),
                None => diagnostics.push(Diagnostic::error(
                    pos.line,
                    pos.column,
                    format!("numeric literal `{}` is out of range", text),
                )),
            }
            continue;
        }

        if c.is_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            col += i - start;
            tokens.push((Tok::Ident(chars[start..i].iter().collect()), pos));
            continue;
        }

        if c == '"' {
            i += 1;
            col += 1;
            let mut text = String::new();
            let mut closed = false;
            while i < chars.len() && chars[i] != '\n' {
                let ch = chars[i];
                i += 1;
                col += 1;
                match ch {
                    '"' => {
                        closed = true;
                        break;
                    }
                    '\\' if i < chars.len() => {
                        let escaped = chars[i];
                        i += 1;
                        if escaped == '\n' {
                            line += 1;
                            col = 1;
                        } else {
                            col += 1;
                        }
                        text.push(match escaped {
                            'n' => '\n',
                            't' => '\t',
                            other => other,
                        });
                    }
                    other => text.push(other),
                }
            }
            if closed {
                tokens.push((Tok::Str(text), pos));
            } else {
                diagnostics.push(Diagnostic::error(
                    pos.line,
                    pos.column,
                    "unterminated string literal",
                ));
            }
            continue;
        }

        let simple = match c {
            '(' => {
                depth += 1;
                Some(Tok::LParen)
            }
            ')' => {
                depth = depth.saturating_sub(1);
                Some(Tok::RParen)
            }
            ',' => Some(Tok::Comma),
            ';' => Some(Tok::Semi),
            _ => None,
        };
        if let Some(tok) = simple {
            tokens.push((tok, pos));
            i += 1;
            col += 1;
            continue;
        }

        let rest: String = chars[i..chars.len().min(i + 2)].iter().collect();
        match OPERATORS.iter().find(|op| rest.starts_with(**op)) {
            Some(op) => {
                tokens.push((Tok::Op(*op), pos));
                i += op.len();
                col += op.len();
            }
            None => {
                diagnostics.push(Diagnostic::error(
                    line,
                    col,
                    format!("unexpected character `{}`", c),
                ));
                i += 1;
                col += 1;
            }
        }
    }

    tokens.push((Tok::Eof, Pos::new(line, col)));
    tokens
}

/// Deepest expression tree a submission may build. Every parenthesis,
/// unary operator, call and chained binary operator adds one level.
pub const MAX_EXPR_DEPTH: usize = 128;

struct Parser {
    tokens: Vec<(Tok, Pos)>,
    index: usize,
    depth: usize,
}

type ParseResult<T> = Result<T, Diagnostic>;

impl Parser {
    fn peek(&self) -> &Tok {
        &self.tokens[self.index].0
    }

    fn peek_at(&self, offset: usize) -> &Tok {
        let last = self.tokens.len() - 1;
        &self.tokens[(self.index + offset).min(last)].0
    }

    fn pos(&self) -> Pos {
        self.tokens[self.index].1
    }

    fn advance(&mut self) -> (Tok, Pos) {
        let token = self.tokens[self.index].clone();
        if self.index < self.tokens.len() - 1 {
            self.index += 1;
        }
        token
    }

    fn unexpected(&self, expected: &str) -> Diagnostic {
        let pos = self.pos();
        Diagnostic::error(
            pos.line,
            pos.column,
            format!("expected {}, found {}", expected, self.peek().describe()),
        )
    }

    fn eat_op(&mut self, op: &str) -> bool {
        if matches!(self.peek(), Tok::Op(o) if *o == op) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn descend(&mut self) -> ParseResult<()> {
        if self.depth >= MAX_EXPR_DEPTH {
            let pos = self.pos();
            return Err(Diagnostic::error(
                pos.line,
                pos.column,
                format!("expression is nested too deeply (limit {})", MAX_EXPR_DEPTH),
            ));
        }
        self.depth += 1;
        Ok(())
    }

    fn ascend(&mut self) {
        self.depth -= 1;
    }

    fn skip_separators(&mut self) {
        while matches!(self.peek(), Tok::Semi | Tok::Newline) {
            self.advance();
        }
    }

    /// Skip to the start of the next statement after an error.
    fn recover(&mut self) {
        while !matches!(self.peek(), Tok::Semi | Tok::Newline | Tok::Eof) {
            self.advance();
        }
    }

    fn statement(&mut self) -> ParseResult<Stmt> {
        if let (Tok::Ident(keyword), Tok::Ident(_), Tok::Op("=")) =
            (self.peek(), self.peek_at(1), self.peek_at(2))
        {
            let annotation = Type::from_keyword(keyword);
            if keyword == "var" || annotation.is_some() {
                self.advance();
                let (name_tok, pos) = self.advance();
                let Tok::Ident(name) = name_tok else {
                    unreachable!("checked by lookahead");
                };
                self.advance();
                let init = self.expression()?;
                return Ok(Stmt::Declare {
                    name,
                    annotation,
                    init,
                    pos,
                });
            }
        }

        let pos = self.pos();
        let expr = self.expression()?;
        Ok(Stmt::Expr {
            expr,
            terminated: false,
            pos,
        })
    }

    fn expression(&mut self) -> ParseResult<Expr> {
        self.equality()
    }

    fn binary_level(
        &mut self,
        ops: &[(&str, BinaryOp)],
        next: fn(&mut Self) -> ParseResult<Expr>,
    ) -> ParseResult<Expr> {
        let base = self.depth;
        let mut lhs = next(self)?;
        'outer: loop {
            for (text, op) in ops {
                if matches!(self.peek(), Tok::Op(o) if o == text) {
                    let (_, pos) = self.advance();
                    // A chain folds into a left-deep tree, one level per operator.
                    self.descend()?;
                    let rhs = next(self)?;
                    lhs = Expr::Binary {
                        op: *op,
                        lhs: Box::new(lhs),
                        rhs: Box::new(rhs),
                        pos,
                    };
                    continue 'outer;
                }
            }
            self.depth = base;
            return Ok(lhs);
        }
    }

    fn equality(&mut self) -> ParseResult<Expr> {
        self.binary_level(&[("==", BinaryOp::Eq), ("!=", BinaryOp::Ne)], Self::comparison)
    }

    fn comparison(&mut self) -> ParseResult<Expr> {
        self.binary_level(
            &[
                ("<", BinaryOp::Lt),
                ("<=", BinaryOp::Le),
                (">", BinaryOp::Gt),
                (">=", BinaryOp::Ge),
            ],
            Self::additive,
        )
    }

    fn additive(&mut self) -> ParseResult<Expr> {
        self.binary_level(&[("+", BinaryOp::Add), ("-", BinaryOp::Sub)], Self::multiplicative)
    }

    fn multiplicative(&mut self) -> ParseResult<Expr> {
        self.binary_level(
            &[("*", BinaryOp::Mul), ("/", BinaryOp::Div), ("%", BinaryOp::Rem)],
            Self::unary,
        )
    }

    fn unary(&mut self) -> ParseResult<Expr> {
        let pos = self.pos();
        let op = if self.eat_op("-") {
            UnaryOp::Neg
        } else if self.eat_op("!") {
            UnaryOp::Not
        } else {
            return self.primary();
        };
        self.descend()?;
        let operand = self.unary()?;
        self.ascend();
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand),
            pos,
        })
    }

    fn primary(&mut self) -> ParseResult<Expr> {
        let pos = self.pos();
        match self.peek().clone() {
            Tok::Int(v) => {
                self.advance();
                Ok(Expr::Literal { value: v.into() })
            }
            Tok::Double(v) => {
                self.advance();
                Ok(Expr::Literal { value: v.into() })
            }
            Tok::Str(s) => {
                self.advance();
                Ok(Expr::Literal { value: s.into() })
            }
            Tok::Ident(name) if name == "true" || name == "false" => {
                self.advance();
                Ok(Expr::Literal {
                    value: (name == "true").into(),
                })
            }
            Tok::Ident(name) => {
                self.advance();
                if matches!(self.peek(), Tok::LParen) {
                    self.advance();
                    self.descend()?;
                    let args = self.arguments()?;
                    self.ascend();
                    Ok(Expr::Call {
                        function: name,
                        args,
                        pos,
                    })
                } else {
                    Ok(Expr::Name { name, pos })
                }
            }
            Tok::LParen => {
                self.advance();
                self.descend()?;
                let inner = self.expression()?;
                self.ascend();
                if !matches!(self.peek(), Tok::RParen) {
                    return Err(self.unexpected("`)`"));
                }
                self.advance();
                Ok(inner)
            }
            _ => Err(self.unexpected("expression")),
        }
    }

    fn arguments(&mut self) -> ParseResult<Vec<Expr>> {
        let mut args = Vec::new();
        if matches!(self.peek(), Tok::RParen) {
            self.advance();
            return Ok(args);
        }
        loop {
            args.push(self.expression()?);
            match self.peek() {
                Tok::Comma => {
                    self.advance();
                }
                Tok::RParen => {
                    self.advance();
                    return Ok(args);
                }
                _ => return Err(self.unexpected("`,` or `)`")),
            }
        }
    }
}

/// Parse a submission into statements, collecting every syntax error.
pub fn parse(source: &str) -> Result<Vec<Stmt>, Vec<Diagnostic>> {
    let mut diagnostics = Vec::new();
    let tokens = lex(source, &mut diagnostics);
    let mut parser = Parser {
        tokens,
        index: 0,
        depth: 0,
    };
    let mut program = Vec::new();

    loop {
        parser.skip_separators();
        if matches!(parser.peek(), Tok::Eof) {
            break;
        }
        parser.depth = 0;
        match parser.statement() {
            Ok(mut stmt) => match parser.peek() {
                Tok::Semi => {
                    if let Stmt::Expr { terminated, .. } = &mut stmt {
                        *terminated = true;
                    }
                    program.push(stmt);
                }
                Tok::Newline | Tok::Eof => program.push(stmt),
                _ => {
                    diagnostics.push(parser.unexpected("`;` or end of line"));
                    parser.recover();
                }
            },
            Err(diagnostic) => {
                diagnostics.push(diagnostic);
                parser.recover();
            }
        }
    }

    if diagnostics.is_empty() {
        Ok(program)
    } else {
        Err(diagnostics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_expression_statement() {
        let program = parse("1+1").unwrap();
        assert_eq!(program.len(), 1);
        match &program[0] {
            Stmt::Expr { expr, terminated, .. } => {
                assert!(!terminated);
                assert!(matches!(expr, Expr::Binary { op: BinaryOp::Add, .. }));
            }
            other => panic!("unexpected statement: {:?}", other),
        }
    }

    #[test]
    fn test_parse_declarations() {
        let program = parse("var x = 1;\nstring s = \"a\"").unwrap();
        assert_eq!(program.len(), 2);
        assert!(matches!(
            &program[0],
            Stmt::Declare { name, annotation: None, .. } if name == "x"
        ));
        assert!(matches!(
            &program[1],
            Stmt::Declare { name, annotation: Some(Type::String), pos, .. }
                if name == "s" && pos.line == 2
        ));
    }

    #[test]
    fn test_terminated_expression() {
        let program = parse("x + 1;").unwrap();
        assert!(matches!(&program[0], Stmt::Expr { terminated: true, .. }));
    }

    #[test]
    fn test_precedence() {
        let program = parse("1 + 2 * 3").unwrap();
        let Stmt::Expr { expr, .. } = &program[0] else {
            panic!("expected expression");
        };
        let Expr::Binary { op, rhs, .. } = expr else {
            panic!("expected binary");
        };
        assert_eq!(*op, BinaryOp::Add);
        assert!(matches!(**rhs, Expr::Binary { op: BinaryOp::Mul, .. }));
    }

    #[test]
    fn test_comparison_operators() {
        let program = parse("1 <= 2").unwrap();
        let Stmt::Expr { expr, .. } = &program[0] else {
            panic!("expected expression");
        };
        assert!(matches!(expr, Expr::Binary { op: BinaryOp::Le, .. }));
    }

    #[test]
    fn test_calls_and_parens_span_lines() {
        let program = parse("arg(\n0\n)").unwrap();
        assert_eq!(program.len(), 1);
        assert!(matches!(
            &program[0],
            Stmt::Expr { expr: Expr::Call { function, args, .. }, .. }
                if function == "arg" && args.len() == 1
        ));
    }

    #[test]
    fn test_comments_and_escapes() {
        let program = parse("\"a\\\"b\" // trailing").unwrap();
        let Stmt::Expr { expr, .. } = &program[0] else {
            panic!("expected expression");
        };
        assert_eq!(
            *expr,
            Expr::Literal {
                value: ScriptValue::from("a\"b")
            }
        );
    }

    #[test]
    fn test_errors_are_collected_per_statement() {
        let diagnostics = parse("1 +;\n(2").unwrap_err();
        assert_eq!(diagnostics.len(), 2);
        assert_eq!(diagnostics[0].line, 1);
        assert_eq!(diagnostics[1].line, 2);
        assert!(diagnostics.iter().all(Diagnostic::is_error));
    }

    #[test]
    fn test_unterminated_string() {
        let diagnostics = parse("\"open").unwrap_err();
        assert!(diagnostics[0].message.contains("unterminated"));
    }

    #[test]
    fn test_long_flat_chain_is_rejected() {
        let source = vec!["1"; 20_000].join("+");
        let diagnostics = parse(&source).unwrap_err();
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].message.contains("nested too deeply"));
    }

    #[test]
    fn test_deep_parentheses_are_rejected() {
        let source = format!("{}1{}", "(".repeat(5_000), ")".repeat(5_000));
        let diagnostics = parse(&source).unwrap_err();
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].message.contains("nested too deeply"));
    }

    #[test]
    fn test_deep_unary_is_rejected() {
        let source = format!("{}1", "-".repeat(5_000));
        assert!(parse(&source).is_err());
    }

    #[test]
    fn test_chain_below_limit_parses() {
        let source = vec!["1"; MAX_EXPR_DEPTH / 2].join(" + ");
        assert_eq!(parse(&source).unwrap().len(), 1);

        let nested = format!("{}1{}", "(".repeat(40), ")".repeat(40));
        assert_eq!(parse(&nested).unwrap().len(), 1);
    }

    #[test]
    fn test_limit_resets_per_statement() {
        let line = vec!["1"; MAX_EXPR_DEPTH / 2].join(" + ");
        let source = format!("{}\n{}\n{}", line, line, line);
        assert_eq!(parse(&source).unwrap().len(), 3);
    }

    #[test]
    fn test_escaped_newline_keeps_line_numbers() {
        let diagnostics = parse("\"a\\\nb\"\n@").unwrap_err();
        assert_eq!(diagnostics[0].line, 3);
        assert_eq!(diagnostics[0].column, 1);
    }

    #[test]
    fn test_empty_source() {
        assert!(parse("").unwrap().is_empty());
        assert!(parse(";;\n\n").unwrap().is_empty());
    }
}
