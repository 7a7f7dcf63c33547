//! Arithmetic expression tool
//!
//! Integers stay exact (i64) until a float operand, a non-integral function
//! result or an overflow forces promotion to f64.

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde_json::Value;

use crate::tools::{required_str, ParameterProperty, ParameterSchema, Tool, ToolContext, ToolResult};

/// Deepest nesting of parentheses, signs, powers and calls accepted
const MAX_DEPTH: usize = 256;

/// Tool for evaluating arithmetic expressions
pub struct CalculateTool;

#[async_trait]
impl Tool for CalculateTool {
    fn name(&self) -> &str {
        "calculate"
    }

    fn description(&self) -> &str {
        "Evaluate an arithmetic expression. Supports + - * / % ^ (power), parentheses and the functions sqrt, abs, ceil, floor, round, log, log2, log10, sin, cos, tan, pow."
    }

    fn parameters_schema(&self) -> ParameterSchema {
        ParameterSchema::new()
            .with_required(
                "expression",
                ParameterProperty::string("The expression to evaluate, e.g. (2+3)*4"),
            )
    }

    async fn execute(&self, args: &Value, _ctx: &ToolContext) -> Result<ToolResult> {
        let expression = required_str(args, "expression")?;
        match calc(expression) {
            Ok(value) => Ok(ToolResult::success(value)),
            Err(e) => Ok(ToolResult::error(e.to_string())),
        }
    }
}

/// Evaluate an expression and format the result
pub fn calc(expression: &str) -> Result<String> {
    let tokens = tokenize(expression)?;
    if tokens.is_empty() {
        bail!("empty expression");
    }

    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let value = parser.expr()?;
    if let Some(tok) = parser.peek() {
        bail!("unexpected token {}", tok);
    }

    value.format()
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    fn as_f64(self) -> f64 {
        match self {
            Number::Int(i) => i as f64,
            Number::Float(f) => f,
        }
    }

    fn format(self) -> Result<String> {
        match self {
            Number::Int(i) => Ok(i.to_string()),
            Number::Float(f) if !f.is_finite() => bail!("result is not a finite number"),
            Number::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => Ok((f as i64).to_string()),
            Number::Float(f) => Ok(f.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Num(Number),
    Ident(String),
    Op(char),
    LParen,
    RParen,
    Comma,
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Num(Number::Int(i)) => write!(f, "'{}'", i),
            Token::Num(Number::Float(x)) => write!(f, "'{}'", x),
            Token::Ident(name) => write!(f, "'{}'", name),
            Token::Op(c) => write!(f, "'{}'", c),
            Token::LParen => write!(f, "'('"),
            Token::RParen => write!(f, "')'"),
            Token::Comma => write!(f, "','"),
        }
    }
}

fn tokenize(input: &str) -> Result<Vec<Token>> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '0'..='9' | '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let literal: String = chars[start..i].iter().collect();
                let number = if literal.contains('.') {
                    literal
                        .parse::<f64>()
                        .map(Number::Float)
                        .map_err(|_| anyhow::anyhow!("invalid number '{}'", literal))?
                } else {
                    match literal.parse::<i64>() {
                        Ok(n) => Number::Int(n),
                        Err(_) => Number::Float(literal.parse::<f64>()?),
                    }
                };
                tokens.push(Token::Num(number));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                tokens.push(Token::Ident(chars[start..i].iter().collect()));
            }
            '+' | '-' | '*' | '/' | '%' | '^' => {
                tokens.push(Token::Op(c));
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            other => bail!("unexpected character '{}'", other),
        }
    }

    Ok(tokens)
}

/// Recursive descent, lowest precedence first:
/// expr := term (('+'|'-') term)*
/// term := unary (('*'|'/'|'%') unary)*
/// unary := ('+'|'-') unary | power
/// power := primary ('^' unary)?
///
/// Every nesting level passes through `unary`, so that is where depth is counted.
struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        tok
    }

    fn eat_op(&mut self, ops: &[char]) -> Option<char> {
        match self.peek() {
            Some(Token::Op(c)) if ops.contains(c) => {
                let c = *c;
                self.pos += 1;
                Some(c)
            }
            _ => None,
        }
    }

    fn expect(&mut self, expected: Token) -> Result<()> {
        match self.next() {
            Some(ref tok) if *tok == expected => Ok(()),
            Some(tok) => bail!("expected {} but found {}", expected, tok),
            None => bail!("expected {} but reached end of expression", expected),
        }
    }

    fn expr(&mut self) -> Result<Number> {
        let mut left = self.term()?;
        while let Some(op) = self.eat_op(&['+', '-']) {
            let right = self.term()?;
            left = binary(op, left, right)?;
        }
        Ok(left)
    }

    fn term(&mut self) -> Result<Number> {
        let mut left = self.unary()?;
        while let Some(op) = self.eat_op(&['*', '/', '%']) {
            let right = self.unary()?;
            left = binary(op, left, right)?;
        }
        Ok(left)
    }

    fn unary(&mut self) -> Result<Number> {
        if self.depth >= MAX_DEPTH {
            bail!("expression nested too deeply (limit {})", MAX_DEPTH);
        }
        self.depth += 1;
        let value = self.signed();
        self.depth -= 1;
        value
    }

    fn signed(&mut self) -> Result<Number> {
        match self.eat_op(&['+', '-']) {
            Some('-') => match self.unary()? {
                Number::Int(i) => Ok(i
                    .checked_neg()
                    .map(Number::Int)
                    .unwrap_or(Number::Float(-(i as f64)))),
                Number::Float(f) => Ok(Number::Float(-f)),
            },
            Some(_) => self.unary(),
            None => self.power(),
        }
    }

    fn power(&mut self) -> Result<Number> {
        let base = self.primary()?;
        if self.eat_op(&['^']).is_some() {
            let exponent = self.unary()?;
            return binary('^', base, exponent);
        }
        Ok(base)
    }

    fn primary(&mut self) -> Result<Number> {
        match self.next() {
            Some(Token::Num(n)) => Ok(n),
            Some(Token::LParen) => {
                let value = self.expr()?;
                self.expect(Token::RParen)?;
                Ok(value)
            }
            Some(Token::Ident(name)) => {
                if self.peek() != Some(&Token::LParen) {
                    bail!("unknown identifier '{}'", name);
                }
                self.pos += 1;
                let args = self.call_args()?;
                call(&name, &args)
            }
            Some(tok) => bail!("unexpected token {}", tok),
            None => bail!("unexpected end of expression"),
        }
    }

    fn call_args(&mut self) -> Result<Vec<Number>> {
        let mut args = Vec::new();
        if self.peek() == Some(&Token::RParen) {
            self.pos += 1;
            return Ok(args);
        }
        loop {
            args.push(self.expr()?);
            match self.next() {
                Some(Token::Comma) => continue,
                Some(Token::RParen) => return Ok(args),
                Some(tok) => bail!("expected ',' or ')' but found {}", tok),
                None => bail!("unclosed function call"),
            }
        }
    }
}

fn binary(op: char, left: Number, right: Number) -> Result<Number> {
    if let (Number::Int(a), Number::Int(b)) = (left, right) {
        let exact = match op {
            '+' => a.checked_add(b),
            '-' => a.checked_sub(b),
            '*' => a.checked_mul(b),
            '/' if b == 0 => bail!("division by zero"),
            '/' => a.checked_div(b),
            '%' if b == 0 => bail!("modulo by zero"),
            '%' => a.checked_rem(b),
            '^' if b >= 0 => u32::try_from(b).ok().and_then(|e| a.checked_pow(e)),
            '^' => None,
            _ => bail!("unsupported operator '{}'", op),
        };
        if let Some(value) = exact {
            return Ok(Number::Int(value));
        }
    }

    let (a, b) = (left.as_f64(), right.as_f64());
    let value = match op {
        '+' => a + b,
        '-' => a - b,
        '*' => a * b,
        '/' if b == 0.0 => bail!("division by zero"),
        '/' => a / b,
        '%' if b == 0.0 => bail!("modulo by zero"),
        '%' => a % b,
        '^' => a.powf(b),
        _ => bail!("unsupported operator '{}'", op),
    };
    Ok(Number::Float(value))
}

fn call(name: &str, args: &[Number]) -> Result<Number> {
    if args.is_empty() {
        bail!("{} requires arguments", name);
    }

    if name == "pow" {
        if args.len() != 2 {
            bail!("pow requires 2 arguments, got {}", args.len());
        }
        return binary('^', args[0], args[1]);
    }

    if args.len() != 1 {
        bail!("{} takes 1 argument, got {}", name, args.len());
    }
    let arg = args[0];
    let x = arg.as_f64();

    let value = match name {
        "abs" => {
            if let Number::Int(i) = arg {
                if let Some(abs) = i.checked_abs() {
                    return Ok(Number::Int(abs));
                }
            }
            x.abs()
        }
        "sqrt" if x < 0.0 => bail!("square root of negative number"),
        "sqrt" => x.sqrt(),
        "ceil" => x.ceil(),
        "floor" => x.floor(),
        "round" => x.round(),
        "log" | "log2" | "log10" if x <= 0.0 => bail!("{} of non-positive number", name),
        "log" => x.ln(),
        "log2" => x.log2(),
        "log10" => x.log10(),
        "sin" => x.sin(),
        "cos" => x.cos(),
        "tan" => x.tan(),
        _ => bail!("unknown function '{}'", name),
    };
    Ok(Number::Float(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_calc_values() {
        let cases = [
            ("2+3", "5"),
            ("10-3", "7"),
            ("4*5", "20"),
            ("10/2", "5"),
            ("10/3", "3"),
            ("10%3", "1"),
            ("2^3", "8"),
            ("1.5+2.5", "4"),
            ("5.0/2.0", "2.5"),
            ("1+0.5", "1.5"),
            ("-5", "-5"),
            ("+5", "5"),
            ("-1.5", "-1.5"),
            ("(2+3)*4", "20"),
            ("((2+3)*2)+1", "11"),
            ("2+3*4", "14"),
            ("-2^2", "-4"),
            ("1000000000*1000000000", "1000000000000000000"),
            ("sqrt(4)", "2"),
            ("abs(-5)", "5"),
            ("ceil(1.2)", "2"),
            ("floor(1.9)", "1"),
            ("round(1.5)", "2"),
            ("round(1.4)", "1"),
            ("log(1)", "0"),
            ("log2(8)", "3"),
            ("log10(100)", "2"),
            ("sin(0)", "0"),
            ("cos(0)", "1"),
            ("pow(2,3)", "8"),
            ("2^-1", "0.5"),
        ];

        for (expr, want) in cases {
            let got = calc(expr).unwrap_or_else(|e| panic!("calc({:?}) failed: {}", expr, e));
            assert_eq!(got, want, "calc({:?})", expr);
        }
    }

    #[test]
    fn test_calc_errors() {
        let cases = [
            ("", "empty expression"),
            ("(", "unexpected end of expression"),
            ("5/0", "division by zero"),
            ("5%0", "modulo by zero"),
            ("5.0/0", "division by zero"),
            ("5.0%0", "modulo by zero"),
            ("sqrt(-1)", "square root of negative number"),
            ("log(0)", "log of non-positive number"),
            ("log(-1)", "log of non-positive number"),
            ("pow(2)", "pow requires 2 arguments"),
            ("unknown(5)", "unknown function 'unknown'"),
            ("sqrt()", "sqrt requires arguments"),
            ("x", "unknown identifier 'x'"),
            ("x+2", "unknown identifier 'x'"),
            ("2|3", "unexpected character '|'"),
            ("'a'", "unexpected character"),
            ("^5", "unexpected token '^'"),
            ("math.Sqrt(4)", "invalid number '.'"),
            ("(2+3", "expected ')'"),
            ("2 3", "unexpected token '3'"),
        ];

        for (expr, want) in cases {
            let err = calc(expr).expect_err(expr);
            assert!(
                err.to_string().contains(want),
                "calc({:?}) error {:?} should contain {:?}",
                expr,
                err.to_string(),
                want
            );
        }
    }

    #[test]
    fn test_deep_nesting_is_an_error() {
        let deep = [
            format!("{}1{}", "(".repeat(100_000), ")".repeat(100_000)),
            format!("{}1", "-".repeat(100_000)),
            format!("{}1{}", "abs(".repeat(10_000), ")".repeat(10_000)),
            format!("2{}", "^2".repeat(10_000)),
        ];
        for expr in &deep {
            let err = calc(expr).unwrap_err();
            assert!(err.to_string().contains("nested too deeply"), "got {}", err);
        }

        let ok = format!("{}7{}", "(".repeat(100), ")".repeat(100));
        assert_eq!(calc(&ok).unwrap(), "7");
        assert_eq!(calc(&format!("{}1", "-".repeat(100))).unwrap(), "1");
    }

    #[test]
    fn test_integer_overflow_promotes() {
        let out = calc("9223372036854775807+1").unwrap();
        assert!(out.starts_with("922337203685477"), "got {}", out);
    }

    #[tokio::test]
    async fn test_tool_reports_errors_as_results() {
        let ctx = ToolContext::default();

        let ok = CalculateTool.execute(&json!({"expression": "2+3"}), &ctx).await.unwrap();
        assert!(ok.success);
        assert_eq!(ok.output, "5");

        let failed = CalculateTool.execute(&json!({"expression": "1/0"}), &ctx).await.unwrap();
        assert!(!failed.success);
        assert_eq!(failed.error.as_deref(), Some("division by zero"));
    }
}
