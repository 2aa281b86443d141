//! Arithmetic expression tool.

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::tool::{Tool, ToolDefinition, ToolError};
use acacia_core::RequestContext;

/// Evaluates `+ - * /` expressions with parentheses, unary minus and decimals.
pub struct CalculateTool;

#[async_trait]
impl Tool for CalculateTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "calculate".to_string(),
            description: "Evaluate an arithmetic expression such as \"(2 + 3) * 4\".".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "expr": {
                        "type": "string",
                        "description": "Expression using + - * / and parentheses"
                    }
                },
                "required": ["expr"]
            }),
        }
    }

    async fn execute(
        &self,
        args: Map<String, Value>,
        _context: &RequestContext,
    ) -> Result<Value, ToolError> {
        let expr = args
            .get("expr")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::InvalidInput("missing 'expr' field".to_string()))?;

        let value = evaluate(expr)?;
        debug!(expr, value, "calculated");
        Ok(to_json_number(value))
    }
}

/// Whole results become JSON integers so "2+2" renders as `4`, not `4.0`.
fn to_json_number(value: f64) -> Value {
    if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        json!(value as i64)
    } else {
        json!(value)
    }
}

pub fn evaluate(expr: &str) -> Result<f64, ToolError> {
    let mut parser = Parser {
        chars: expr.chars().filter(|c| !c.is_whitespace()).collect(),
        pos: 0,
    };
    if parser.chars.is_empty() {
        return Err(ToolError::InvalidInput("empty expression".to_string()));
    }
    let value = parser.expression()?;
    if let Some(c) = parser.peek() {
        return Err(ToolError::InvalidInput(format!(
            "unexpected '{c}' at position {}",
            parser.pos
        )));
    }
    if !value.is_finite() {
        return Err(ToolError::InvalidInput("result is not a finite number".to_string()));
    }
    Ok(value)
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn expression(&mut self) -> Result<f64, ToolError> {
        let mut acc = self.term()?;
        while let Some(op @ ('+' | '-')) = self.peek() {
            self.pos += 1;
            let rhs = self.term()?;
            acc = if op == '+' { acc + rhs } else { acc - rhs };
        }
        Ok(acc)
    }

    fn term(&mut self) -> Result<f64, ToolError> {
        let mut acc = self.factor()?;
        while let Some(op @ ('*' | '/')) = self.peek() {
            self.pos += 1;
            let rhs = self.factor()?;
            if op == '*' {
                acc *= rhs;
            } else {
                if rhs == 0.0 {
                    return Err(ToolError::InvalidInput("division by zero".to_string()));
                }
                acc /= rhs;
            }
        }
        Ok(acc)
    }

    fn factor(&mut self) -> Result<f64, ToolError> {
        match self.peek() {
            Some('-') => {
                self.pos += 1;
                Ok(-self.factor()?)
            }
            Some('+') => {
                self.pos += 1;
                self.factor()
            }
            Some('(') => {
                self.pos += 1;
                let value = self.expression()?;
                if self.peek() != Some(')') {
                    return Err(ToolError::InvalidInput("missing closing ')'".to_string()));
                }
                self.pos += 1;
                Ok(value)
            }
            Some(c) if c.is_ascii_digit() || c == '.' => self.number(),
            Some(c) => Err(ToolError::InvalidInput(format!(
                "unexpected '{c}' at position {}",
                self.pos
            ))),
            None => Err(ToolError::InvalidInput("unexpected end of expression".to_string())),
        }
    }

    fn number(&mut self) -> Result<f64, ToolError> {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_digit() || c == '.') {
            self.pos += 1;
        }
        let literal: String = self.chars[start..self.pos].iter().collect();
        literal
            .parse()
            .map_err(|_| ToolError::InvalidInput(format!("invalid number '{literal}'")))
    }
}
