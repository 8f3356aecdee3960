//! Expression evaluator for conditions, loop guards, and iterables.
//!
//! Deliberately small. Supported: dotted field access against the run
//! scope (`nodes.login.response.status`), comparisons (`==` `!=` `>`
//! `<` `>=` `<=`), logical `&&` `||` `!`, parentheses, and string /
//! number / bool / null literals. Numbers compare with f64 coercion.
//! Missing fields resolve to null, so comparisons against absent data
//! are false rather than errors.

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
#[non_exhaustive]
pub enum ExprError {
    #[error("expression parse error: {message}")]
    Parse { message: String },
}

/// Evaluate an expression to a boolean against a flattened scope.
pub fn evaluate_bool(expression: &str, ctx: &Value) -> Result<bool, ExprError> {
    Ok(truthy(&evaluate(expression, ctx)?))
}

/// Evaluate an expression to a value. A bare path yields the resolved
/// JSON value (this is how `for_each` obtains its iterable); anything
/// involving operators yields a boolean.
pub fn evaluate(expression: &str, ctx: &Value) -> Result<Value, ExprError> {
    let tokens = Lexer::new(expression).run()?;
    let mut parser = Parser {
        tokens: &tokens,
        pos: 0,
        ctx,
    };
    let value = parser.or_expr()?;
    if parser.pos != tokens.len() {
        return Err(ExprError::Parse {
            message: format!("trailing input at token {}", parser.pos),
        });
    }
    Ok(value)
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(_) => true,
    }
}

// ---------------------------------------------------------------------------
// Lexer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Path(String),
    Str(String),
    Num(f64),
    Bool(bool),
    Null,
    Op(Op),
    Not,
    And,
    Or,
    LParen,
    RParen,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Op {
    Eq,
    Ne,
    Gt,
    Lt,
    Ge,
    Le,
}

struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            chars: input.chars().peekable(),
        }
    }

    fn run(mut self) -> Result<Vec<Token>, ExprError> {
        let mut tokens = Vec::new();
        while let Some(&c) = self.chars.peek() {
            match c {
                ' ' | '\t' | '\r' | '\n' => {
                    self.chars.next();
                }
                '(' => {
                    self.chars.next();
                    tokens.push(Token::LParen);
                }
                ')' => {
                    self.chars.next();
                    tokens.push(Token::RParen);
                }
                '=' => {
                    self.chars.next();
                    self.expect('=')?;
                    tokens.push(Token::Op(Op::Eq));
                }
                '!' => {
                    self.chars.next();
                    if self.chars.peek() == Some(&'=') {
                        self.chars.next();
                        tokens.push(Token::Op(Op::Ne));
                    } else {
                        tokens.push(Token::Not);
                    }
                }
                '>' => {
                    self.chars.next();
                    if self.chars.peek() == Some(&'=') {
                        self.chars.next();
                        tokens.push(Token::Op(Op::Ge));
                    } else {
                        tokens.push(Token::Op(Op::Gt));
                    }
                }
                '<' => {
                    self.chars.next();
                    if self.chars.peek() == Some(&'=') {
                        self.chars.next();
                        tokens.push(Token::Op(Op::Le));
                    } else {
                        tokens.push(Token::Op(Op::Lt));
                    }
                }
                '&' => {
                    self.chars.next();
                    self.expect('&')?;
                    tokens.push(Token::And);
                }
                '|' => {
                    self.chars.next();
                    self.expect('|')?;
                    tokens.push(Token::Or);
                }
                '"' | '\'' => tokens.push(self.string(c)?),
                c if c.is_ascii_digit() || c == '-' => tokens.push(self.number()?),
                c if c.is_ascii_alphabetic() || c == '_' => tokens.push(self.ident()),
                other => {
                    return Err(ExprError::Parse {
                        message: format!("unexpected character: {other}"),
                    });
                }
            }
        }
        Ok(tokens)
    }

    fn expect(&mut self, want: char) -> Result<(), ExprError> {
        match self.chars.next() {
            Some(c) if c == want => Ok(()),
            other => Err(ExprError::Parse {
                message: format!("expected '{want}', got {other:?}"),
            }),
        }
    }

    fn string(&mut self, quote: char) -> Result<Token, ExprError> {
        self.chars.next();
        let mut s = String::new();
        for c in self.chars.by_ref() {
            if c == quote {
                return Ok(Token::Str(s));
            }
            s.push(c);
        }
        Err(ExprError::Parse {
            message: "unterminated string literal".into(),
        })
    }

    fn number(&mut self) -> Result<Token, ExprError> {
        let mut s = String::new();
        if self.chars.peek() == Some(&'-') {
            s.push('-');
            self.chars.next();
        }
        while let Some(&c) = self.chars.peek() {
            if c.is_ascii_digit() || c == '.' {
                s.push(c);
                self.chars.next();
            } else {
                break;
            }
        }
        s.parse::<f64>()
            .map(Token::Num)
            .map_err(|_| ExprError::Parse {
                message: format!("invalid number: {s}"),
            })
    }

    fn ident(&mut self) -> Token {
        let mut s = String::new();
        while let Some(&c) = self.chars.peek() {
            if c.is_ascii_alphanumeric() || c == '_' || c == '.' {
                s.push(c);
                self.chars.next();
            } else {
                break;
            }
        }
        match s.as_str() {
            "true" => Token::Bool(true),
            "false" => Token::Bool(false),
            "null" => Token::Null,
            _ => Token::Path(s),
        }
    }
}

// ---------------------------------------------------------------------------
// Parser — precedence: ! > comparison > && > ||
// ---------------------------------------------------------------------------

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    ctx: &'a Value,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn or_expr(&mut self) -> Result<Value, ExprError> {
        let mut left = self.and_expr()?;
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            let right = self.and_expr()?;
            left = Value::Bool(truthy(&left) || truthy(&right));
        }
        Ok(left)
    }

    fn and_expr(&mut self) -> Result<Value, ExprError> {
        let mut left = self.not_expr()?;
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            let right = self.not_expr()?;
            left = Value::Bool(truthy(&left) && truthy(&right));
        }
        Ok(left)
    }

    fn not_expr(&mut self) -> Result<Value, ExprError> {
        if self.peek() == Some(&Token::Not) {
            self.pos += 1;
            let value = self.not_expr()?;
            return Ok(Value::Bool(!truthy(&value)));
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Result<Value, ExprError> {
        let left = self.primary()?;
        let op = match self.peek() {
            Some(Token::Op(op)) => *op,
            _ => return Ok(left),
        };
        self.pos += 1;
        let right = self.primary()?;
        Ok(Value::Bool(compare(&left, &right, op)))
    }

    fn primary(&mut self) -> Result<Value, ExprError> {
        let token = self.peek().cloned().ok_or_else(|| ExprError::Parse {
            message: "unexpected end of expression".into(),
        })?;
        self.pos += 1;
        match token {
            Token::Str(s) => Ok(Value::String(s)),
            Token::Num(n) => Ok(serde_json::Number::from_f64(n)
                .map(Value::Number)
                .unwrap_or(Value::Null)),
            Token::Bool(b) => Ok(Value::Bool(b)),
            Token::Null => Ok(Value::Null),
            Token::Path(path) => Ok(resolve_path(self.ctx, &path)),
            Token::LParen => {
                let inner = self.or_expr()?;
                match self.peek() {
                    Some(Token::RParen) => {
                        self.pos += 1;
                        Ok(inner)
                    }
                    _ => Err(ExprError::Parse {
                        message: "expected ')'".into(),
                    }),
                }
            }
            other => Err(ExprError::Parse {
                message: format!("expected value, got {other:?}"),
            }),
        }
    }
}

fn compare(left: &Value, right: &Value, op: Op) -> bool {
    if left.is_null() || right.is_null() {
        let both = left.is_null() && right.is_null();
        return match op {
            Op::Eq => both,
            Op::Ne => !both,
            _ => false,
        };
    }
    if let (Some(l), Some(r)) = (left.as_f64(), right.as_f64()) {
        return match op {
            Op::Eq => (l - r).abs() < f64::EPSILON,
            Op::Ne => (l - r).abs() >= f64::EPSILON,
            Op::Gt => l > r,
            Op::Lt => l < r,
            Op::Ge => l >= r,
            Op::Le => l <= r,
        };
    }
    if let (Some(l), Some(r)) = (left.as_str(), right.as_str()) {
        return match op {
            Op::Eq => l == r,
            Op::Ne => l != r,
            Op::Gt => l > r,
            Op::Lt => l < r,
            Op::Ge => l >= r,
            Op::Le => l <= r,
        };
    }
    if let (Value::Bool(l), Value::Bool(r)) = (left, right) {
        return match op {
            Op::Eq => l == r,
            Op::Ne => l != r,
            _ => false,
        };
    }
    // Type mismatch: only != holds.
    matches!(op, Op::Ne)
}

/// Resolve a dotted path against the context; missing segments → null.
fn resolve_path(ctx: &Value, path: &str) -> Value {
    let mut current = ctx;
    for segment in path.split('.') {
        match current.get(segment) {
            Some(v) => current = v,
            None => return Value::Null,
        }
    }
    current.clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn status_equality() {
        let ctx = json!({"response": {"status": 200}});
        assert!(evaluate_bool("response.status == 200", &ctx).unwrap());
        assert!(!evaluate_bool("response.status == 404", &ctx).unwrap());
    }

    #[test]
    fn string_comparison() {
        let ctx = json!({"env": "prod"});
        assert!(evaluate_bool(r#"env == "prod""#, &ctx).unwrap());
        assert!(evaluate_bool("env == 'prod'", &ctx).unwrap());
        assert!(!evaluate_bool(r#"env != "prod""#, &ctx).unwrap());
    }

    #[test]
    fn numeric_ordering_with_coercion() {
        let ctx = json!({"count": 3});
        assert!(evaluate_bool("count >= 3", &ctx).unwrap());
        assert!(evaluate_bool("count > 2.5", &ctx).unwrap());
        assert!(!evaluate_bool("count < 3", &ctx).unwrap());
        assert!(evaluate_bool("count == 3.0", &ctx).unwrap());
    }

    #[test]
    fn logical_operators_and_parens() {
        let ctx = json!({"a": 1, "b": 2});
        assert!(evaluate_bool("a == 1 && b == 2", &ctx).unwrap());
        assert!(evaluate_bool("a == 9 || b == 2", &ctx).unwrap());
        assert!(evaluate_bool("!(a == 9)", &ctx).unwrap());
        assert!(evaluate_bool("(a == 9 || b == 2) && a == 1", &ctx).unwrap());
    }

    #[test]
    fn missing_field_is_null_not_error() {
        let ctx = json!({});
        assert!(!evaluate_bool("missing == 1", &ctx).unwrap());
        assert!(evaluate_bool("missing == null", &ctx).unwrap());
        assert!(evaluate_bool("missing != 1", &ctx).unwrap());
    }

    #[test]
    fn bare_path_yields_value() {
        let ctx = json!({"nodes": {"list": {"response": {"body": [1, 2, 3]}}}});
        let value = evaluate("nodes.list.response.body", &ctx).unwrap();
        assert_eq!(value, json!([1, 2, 3]));
    }

    #[test]
    fn node_response_path() {
        let ctx = json!({"nodes": {"login": {"response": {"status": 201}}}});
        assert!(evaluate_bool("nodes.login.response.status == 201", &ctx).unwrap());
    }

    #[test]
    fn iteration_guard() {
        let ctx = json!({"iteration_index": 4});
        assert!(evaluate_bool("iteration_index < 5", &ctx).unwrap());
        assert!(!evaluate_bool("iteration_index < 4", &ctx).unwrap());
    }

    #[test]
    fn parse_errors() {
        assert!(evaluate_bool("==", &json!({})).is_err());
        assert!(evaluate_bool("a == ", &json!({})).is_err());
        assert!(evaluate_bool("'open", &json!({})).is_err());
        assert!(evaluate_bool("(a == 1", &json!({})).is_err());
        assert!(evaluate_bool("a @ b", &json!({})).is_err());
    }

    #[test]
    fn type_mismatch_comparisons() {
        let ctx = json!({"s": "x", "n": 1});
        assert!(!evaluate_bool("s == n", &ctx).unwrap());
        assert!(evaluate_bool("s != n", &ctx).unwrap());
        assert!(!evaluate_bool("s > n", &ctx).unwrap());
    }
}
