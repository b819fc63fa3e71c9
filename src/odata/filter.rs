//! Filter compiler (C2): walks the token stream from the lexer, enforces
//! the field/function whitelist, and emits a parameterized WHERE fragment.
//!
//! Builds a small sum-type AST during parsing (per the AST design note)
//! rather than emitting SQL token-by-token; the AST-to-SQL serializer then
//! walks depth-first in source order so operator spellings and `@filterN`
//! numbering match what a linear token walk would have produced.

use super::fields::FieldMap;
use super::lexer::{tokenize, Token, TokenKind};
use crate::error::{Result, ServiceError};
use crate::value::Param;

#[derive(Debug, Clone)]
enum Node {
    /// `<column> <op> @filterN`
    Compare {
        column: &'static str,
        op: &'static str,
        param: String,
    },
    /// `<column> LIKE @filterN`
    Call {
        column: &'static str,
        param: String,
    },
    /// `<column> <op> NULL|1|0`
    CompareLiteral {
        column: &'static str,
        op: &'static str,
        literal: &'static str,
    },
    /// `lhs AND|OR rhs`
    Binary {
        op: &'static str,
        lhs: Box<Node>,
        rhs: Box<Node>,
    },
    /// `NOT inner`
    Not(Box<Node>),
    /// `( inner )`
    Group(Box<Node>),
}

/// Output of the filter compiler: SQL text plus the named parameters it
/// references, in the order parameters were allocated.
#[derive(Debug, Clone, Default)]
pub struct CompiledFilter {
    pub sql: String,
    pub params: Vec<(String, Param)>,
}

struct Compiler<'a> {
    tokens: &'a [Token],
    pos: usize,
    fields: &'static FieldMap,
    params: Vec<(String, Param)>,
}

pub fn compile(filter: &str, fields: &'static FieldMap) -> Result<CompiledFilter> {
    let tokens = tokenize(filter)?;
    let mut compiler = Compiler {
        tokens: &tokens,
        pos: 0,
        fields,
        params: Vec::new(),
    };
    let ast = compiler.parse_sequence()?;
    if compiler.pos != tokens.len() {
        return Err(ServiceError::ParseError(format!(
            "Invalid $filter: unexpected token near position {}",
            compiler.pos
        )));
    }
    let mut sql = String::new();
    render(&ast, &mut sql);
    Ok(CompiledFilter {
        sql,
        params: compiler.params,
    })
}

impl<'a> Compiler<'a> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next_param_name(&self) -> String {
        format!("filter{}", self.params.len())
    }

    fn advance(&mut self) -> Option<&Token> {
        let tok = self.tokens.get(self.pos);
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    /// A maximal run of tokens the caller's parentheses and linear emission
    /// together reproduce as a valid boolean expression; see §4.2: the
    /// compiler does not itself balance parens or enforce precedence beyond
    /// what SQL Server's own AND/OR precedence provides.
    fn parse_sequence(&mut self) -> Result<Node> {
        let mut node = self.parse_unary()?;
        while let Some(tok) = self.peek() {
            if tok.kind == TokenKind::Logical && matches!(tok.value.as_str(), "and" | "or") {
                let op = if tok.value == "and" { "AND" } else { "OR" };
                self.advance();
                let rhs = self.parse_unary()?;
                node = Node::Binary {
                    op,
                    lhs: Box::new(node),
                    rhs: Box::new(rhs),
                };
            } else {
                break;
            }
        }
        Ok(node)
    }

    fn parse_unary(&mut self) -> Result<Node> {
        if let Some(tok) = self.peek() {
            if tok.kind == TokenKind::Logical && tok.value == "not" {
                self.advance();
                let inner = self.parse_unary()?;
                return Ok(Node::Not(Box::new(inner)));
            }
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Node> {
        let tok = self
            .advance()
            .cloned()
            .ok_or_else(|| ServiceError::ParseError("Invalid $filter: unexpected end".into()))?;

        match tok.kind {
            TokenKind::Paren if tok.value == "(" => {
                let inner = self.parse_sequence()?;
                match self.advance() {
                    Some(t) if t.kind == TokenKind::Paren && t.value == ")" => {
                        Ok(Node::Group(Box::new(inner)))
                    }
                    _ => Err(ServiceError::ParseError(
                        "Invalid $filter: expected closing parenthesis".into(),
                    )),
                }
            }
            TokenKind::Function => self.parse_function_call(&tok.value),
            TokenKind::Identifier => self.parse_comparison(&tok.value),
            _ => Err(ServiceError::ParseError(format!(
                "Invalid $filter: unexpected token '{}'",
                tok.value
            ))),
        }
    }

    fn parse_comparison(&mut self, field_name: &str) -> Result<Node> {
        let column = self.fields.to_column(field_name).ok_or_else(|| {
            ServiceError::ParseError(format!("Unknown field: {field_name}"))
        })?;

        let op_tok = self.advance().cloned().ok_or_else(|| {
            ServiceError::ParseError("Invalid $filter: expected operator".into())
        })?;
        if op_tok.kind != TokenKind::Operator {
            return Err(ServiceError::ParseError(format!(
                "Invalid $filter: expected operator, found '{}'",
                op_tok.value
            )));
        }
        let op = sql_operator(&op_tok.value)?;

        let value_tok = self.advance().cloned().ok_or_else(|| {
            ServiceError::ParseError("Invalid $filter: expected value".into())
        })?;

        match value_tok.kind {
            TokenKind::String => {
                let name = self.next_param_name();
                self.params
                    .push((name.clone(), Param::Str(value_tok.value)));
                Ok(Node::Compare {
                    column,
                    op,
                    param: name,
                })
            }
            TokenKind::Datetime => {
                let name = self.next_param_name();
                self.params
                    .push((name.clone(), Param::Str(value_tok.value)));
                Ok(Node::Compare {
                    column,
                    op,
                    param: name,
                })
            }
            TokenKind::Number => {
                let name = self.next_param_name();
                let parsed = parse_number(&value_tok.value)?;
                self.params.push((name.clone(), parsed));
                Ok(Node::Compare {
                    column,
                    op,
                    param: name,
                })
            }
            TokenKind::Literal => {
                let literal = match value_tok.value.as_str() {
                    "null" => "NULL",
                    "true" => "1",
                    "false" => "0",
                    other => {
                        return Err(ServiceError::ParseError(format!(
                            "Invalid $filter: unknown literal '{other}'"
                        )))
                    }
                };
                Ok(Node::CompareLiteral { column, op, literal })
            }
            _ => Err(ServiceError::ParseError(format!(
                "Invalid $filter: unexpected value token '{}'",
                value_tok.value
            ))),
        }
    }

    fn parse_function_call(&mut self, func: &str) -> Result<Node> {
        self.expect_paren("(")?;
        let field_tok = self.advance().cloned().ok_or_else(|| {
            ServiceError::ParseError("Invalid $filter: expected field in function call".into())
        })?;
        if field_tok.kind != TokenKind::Identifier {
            return Err(ServiceError::ParseError(
                "Invalid $filter: function call expects a field identifier".into(),
            ));
        }
        let column = self.fields.to_column(&field_tok.value).ok_or_else(|| {
            ServiceError::ParseError(format!("Unknown field: {}", field_tok.value))
        })?;

        self.expect_comma()?;

        let value_tok = self.advance().cloned().ok_or_else(|| {
            ServiceError::ParseError("Invalid $filter: expected string literal".into())
        })?;
        if value_tok.kind != TokenKind::String {
            return Err(ServiceError::ParseError(
                "Invalid $filter: function call expects a string literal".into(),
            ));
        }
        self.expect_paren(")")?;

        let wrapped = match func {
            "contains" => format!("%{}%", value_tok.value),
            "startswith" => format!("{}%", value_tok.value),
            "endswith" => format!("%{}", value_tok.value),
            other => {
                return Err(ServiceError::ParseError(format!(
                    "Invalid $filter: unsupported function '{other}'"
                )))
            }
        };

        let name = self.next_param_name();
        self.params.push((name.clone(), Param::Str(wrapped)));
        Ok(Node::Call { column, param: name })
    }

    fn expect_paren(&mut self, expected: &str) -> Result<()> {
        match self.advance() {
            Some(t) if t.kind == TokenKind::Paren && t.value == expected => Ok(()),
            _ => Err(ServiceError::ParseError(format!(
                "Invalid $filter: expected '{expected}'"
            ))),
        }
    }

    fn expect_comma(&mut self) -> Result<()> {
        match self.advance() {
            Some(t) if t.kind == TokenKind::Comma => Ok(()),
            _ => Err(ServiceError::ParseError(
                "Invalid $filter: expected ','".into(),
            )),
        }
    }
}

fn sql_operator(op: &str) -> Result<&'static str> {
    Ok(match op {
        "eq" => "=",
        "ne" => "!=",
        "gt" => ">",
        "ge" => ">=",
        "lt" => "<",
        "le" => "<=",
        other => {
            return Err(ServiceError::ParseError(format!(
                "Invalid $filter: unknown operator '{other}'"
            )))
        }
    })
}

fn parse_number(raw: &str) -> Result<Param> {
    if let Ok(i) = raw.parse::<i64>() {
        return Ok(Param::Int(i));
    }
    raw.parse::<f64>()
        .map(Param::Float)
        .map_err(|_| ServiceError::ParseError(format!("Invalid $filter: bad number '{raw}'")))
}

fn render(node: &Node, out: &mut String) {
    match node {
        Node::Compare { column, op, param } => {
            out.push_str(column);
            out.push(' ');
            out.push_str(op);
            out.push_str(" @");
            out.push_str(param);
        }
        Node::CompareLiteral { column, op, literal } => {
            out.push_str(column);
            out.push(' ');
            out.push_str(op);
            out.push(' ');
            out.push_str(literal);
        }
        Node::Call { column, param } => {
            out.push_str(column);
            out.push_str(" LIKE @");
            out.push_str(param);
        }
        Node::Binary { op, lhs, rhs } => {
            render(lhs, out);
            out.push(' ');
            out.push_str(op);
            out.push(' ');
            render(rhs, out);
        }
        Node::Not(inner) => {
            out.push_str("NOT ");
            render(inner, out);
        }
        Node::Group(inner) => {
            out.push('(');
            render(inner, out);
            out.push(')');
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::odata::fields::PROPERTY_FIELDS;

    #[test]
    fn simple_equality() {
        let compiled = compile("City eq 'Los Angeles'", &PROPERTY_FIELDS).unwrap();
        assert_eq!(compiled.sql, "CITY = @filter0");
        assert_eq!(compiled.params, vec![("filter0".to_string(), Param::Str("Los Angeles".into()))]);
    }

    #[test]
    fn conjunction_with_numeric_and_string() {
        let compiled =
            compile("ListPrice gt 500000 and City eq 'LA'", &PROPERTY_FIELDS).unwrap();
        assert_eq!(compiled.sql, "IDCLISTPRICE > @filter0 AND CITY = @filter1");
        assert_eq!(
            compiled.params,
            vec![
                ("filter0".to_string(), Param::Int(500000)),
                ("filter1".to_string(), Param::Str("LA".into())),
            ]
        );
    }

    #[test]
    fn function_call_wraps_like_pattern() {
        let compiled = compile("contains(City, 'Angeles')", &PROPERTY_FIELDS).unwrap();
        assert_eq!(compiled.sql, "CITY LIKE @filter0");
        assert_eq!(
            compiled.params[0].1,
            Param::Str("%Angeles%".to_string())
        );
    }

    #[test]
    fn startswith_and_endswith_wrap_correctly() {
        let start = compile("startswith(City, 'Los')", &PROPERTY_FIELDS).unwrap();
        assert_eq!(start.params[0].1, Param::Str("Los%".to_string()));
        let end = compile("endswith(City, 'Angeles')", &PROPERTY_FIELDS).unwrap();
        assert_eq!(end.params[0].1, Param::Str("%Angeles".to_string()));
    }

    #[test]
    fn literals_null_true_false() {
        let compiled = compile("ListAgentKey eq null", &PROPERTY_FIELDS).unwrap();
        assert_eq!(compiled.sql, "IDCLISTAGENTKEY = NULL");
        assert!(compiled.params.is_empty());
    }

    #[test]
    fn grouping_is_preserved() {
        let compiled = compile(
            "(City eq 'LA' or City eq 'SF') and ListPrice gt 100",
            &PROPERTY_FIELDS,
        )
        .unwrap();
        assert_eq!(
            compiled.sql,
            "(CITY = @filter0 OR CITY = @filter1) AND IDCLISTPRICE > @filter2"
        );
    }

    #[test]
    fn unknown_field_is_rejected() {
        let err = compile("Bogus eq 'x'", &PROPERTY_FIELDS).unwrap_err();
        assert!(err.to_string().contains("Unknown field"));
    }

    #[test]
    fn sql_injection_payload_only_ever_becomes_a_parameter() {
        let compiled =
            compile("City eq '; DROP TABLE users; --'", &PROPERTY_FIELDS).unwrap();
        assert!(!compiled.sql.contains("DROP TABLE"));
        assert_eq!(
            compiled.params[0].1,
            Param::Str("; DROP TABLE users; --".to_string())
        );
    }

    #[test]
    fn bad_operator_token_is_a_parse_error() {
        // lexer itself rejects the bare '=' character.
        assert!(compile("City = 'x'", &PROPERTY_FIELDS).is_err());
    }
}
