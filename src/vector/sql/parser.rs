use crate::errors::*;
use crate::vector::sql::expr::{BinaryOp, Expr, Function, UnaryOp, Value};
use crate::vector::sql::lexer::{tokenize, Spanned, Token};
use crate::vector::FieldType;

const RESERVED: [&str; 19] = [
    "SELECT", "FROM", "WHERE", "AND", "OR", "NOT", "LIKE", "ILIKE", "IN", "BETWEEN", "IS", "NULL",
    "ORDER", "BY", "ASC", "DESC", "LIMIT", "OFFSET", "AS",
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Aggregate {
    Count,
    Min,
    Max,
    Sum,
    Avg,
}

impl Aggregate {
    fn from_name(name: &str) -> Option<Aggregate> {
        Some(match name.to_ascii_uppercase().as_str() {
            "COUNT" => Aggregate::Count,
            "MIN" => Aggregate::Min,
            "MAX" => Aggregate::Max,
            "SUM" => Aggregate::Sum,
            "AVG" => Aggregate::Avg,
            _ => return None,
        })
    }

    pub(crate) fn name(&self) -> &'static str {
        match self {
            Aggregate::Count => "COUNT",
            Aggregate::Min => "MIN",
            Aggregate::Max => "MAX",
            Aggregate::Sum => "SUM",
            Aggregate::Avg => "AVG",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum SelectItem {
    Wildcard,
    Expr {
        expr: Expr,
        alias: Option<String>,
    },
    Aggregate {
        func: Aggregate,
        /// `None` for `COUNT(*)`.
        arg: Option<Expr>,
        distinct: bool,
        alias: Option<String>,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct OrderBy {
    pub(crate) expr: Expr,
    pub(crate) ascending: bool,
}

/// A parsed `SELECT` statement.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Select {
    pub(crate) distinct: bool,
    pub(crate) items: Vec<SelectItem>,
    pub(crate) table: String,
    pub(crate) where_clause: Option<Expr>,
    pub(crate) order_by: Vec<OrderBy>,
    pub(crate) limit: Option<usize>,
    pub(crate) offset: usize,
}

/// Parse a full `SELECT` statement.
pub(crate) fn parse_select(statement: &str) -> Result<Select> {
    let mut parser = Parser::new(statement)?;
    let select = parser.select()?;
    parser.eat_symbol(";");
    parser.expect_eof()?;
    Ok(select)
}

/// Parse a bare expression, as used by attribute filters.
pub(crate) fn parse_expression(input: &str) -> Result<Expr> {
    let mut parser = Parser::new(input)?;
    let expr = parser.expr()?;
    parser.expect_eof()?;
    Ok(expr)
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
}

impl Parser {
    fn new(input: &str) -> Result<Parser> {
        Ok(Parser {
            tokens: tokenize(input)?,
            pos: 0,
        })
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)].token
    }

    fn peek_at(&self, offset: usize) -> &Token {
        &self.tokens[(self.pos + offset).min(self.tokens.len() - 1)].token
    }

    fn position(&self) -> usize {
        self.tokens[self.pos.min(self.tokens.len() - 1)].pos
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn error<T>(&self, msg: impl Into<String>) -> Result<T> {
        Err(GeoError::SqlError {
            position: self.position(),
            msg: msg.into(),
        })
    }

    fn eat_keyword(&mut self, kw: &str) -> bool {
        if self.peek().is_keyword(kw) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_keyword(&mut self, kw: &str) -> Result<()> {
        if self.eat_keyword(kw) {
            Ok(())
        } else {
            self.error(format!("expected {kw}, found {}", describe(self.peek())))
        }
    }

    fn eat_symbol(&mut self, symbol: &str) -> bool {
        if matches!(self.peek(), Token::Symbol(s) if *s == symbol) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_symbol(&mut self, symbol: &str) -> Result<()> {
        if self.eat_symbol(symbol) {
            Ok(())
        } else {
            self.error(format!("expected '{symbol}', found {}", describe(self.peek())))
        }
    }

    fn expect_eof(&self) -> Result<()> {
        match self.peek() {
            Token::Eof => Ok(()),
            other => self.error(format!("unexpected {}", describe(other))),
        }
    }

    /// An identifier usable as a column, table or alias name.
    fn identifier(&mut self) -> Result<String> {
        match self.peek().clone() {
            Token::QuotedIdent(name) => {
                self.advance();
                Ok(name)
            }
            Token::Ident(name) if !is_reserved(&name) => {
                self.advance();
                Ok(name)
            }
            other => self.error(format!("expected a name, found {}", describe(&other))),
        }
    }

    fn select(&mut self) -> Result<Select> {
        self.expect_keyword("SELECT")?;
        let distinct = self.eat_keyword("DISTINCT");
        let mut items = vec![self.select_item()?];
        while self.eat_symbol(",") {
            items.push(self.select_item()?);
        }

        self.expect_keyword("FROM")?;
        let table = match self.peek().clone() {
            Token::Str(name) => {
                self.advance();
                name
            }
            _ => self.identifier()?,
        };

        let where_clause = if self.eat_keyword("WHERE") {
            Some(self.expr()?)
        } else {
            None
        };

        let mut order_by = Vec::new();
        if self.eat_keyword("ORDER") {
            self.expect_keyword("BY")?;
            loop {
                let expr = self.additive()?;
                let ascending = if self.eat_keyword("DESC") {
                    false
                } else {
                    self.eat_keyword("ASC");
                    true
                };
                order_by.push(OrderBy { expr, ascending });
                if !self.eat_symbol(",") {
                    break;
                }
            }
        }

        let mut limit = None;
        let mut offset = 0;
        if self.eat_keyword("LIMIT") {
            limit = Some(self.count("LIMIT")?);
            if self.eat_keyword("OFFSET") {
                offset = self.count("OFFSET")?;
            }
        }

        Ok(Select {
            distinct,
            items,
            table,
            where_clause,
            order_by,
            limit,
            offset,
        })
    }

    fn count(&mut self, clause: &str) -> Result<usize> {
        match self.peek().clone() {
            Token::Integer(v) if v >= 0 => {
                self.advance();
                Ok(v as usize)
            }
            other => self.error(format!(
                "{clause} expects a non-negative integer, found {}",
                describe(&other)
            )),
        }
    }

    fn select_item(&mut self) -> Result<SelectItem> {
        if self.eat_symbol("*") {
            return Ok(SelectItem::Wildcard);
        }

        if let Token::Ident(name) = self.peek().clone() {
            if let Some(func) = Aggregate::from_name(&name) {
                if matches!(self.peek_at(1), Token::Symbol("(")) {
                    self.advance();
                    self.advance();
                    let distinct = self.eat_keyword("DISTINCT");
                    let arg = if func == Aggregate::Count && self.eat_symbol("*") {
                        None
                    } else {
                        Some(self.expr()?)
                    };
                    self.expect_symbol(")")?;
                    let alias = self.alias()?;
                    return Ok(SelectItem::Aggregate {
                        func,
                        arg,
                        distinct,
                        alias,
                    });
                }
            }
        }

        let expr = self.expr()?;
        let alias = self.alias()?;
        Ok(SelectItem::Expr { expr, alias })
    }

    fn alias(&mut self) -> Result<Option<String>> {
        if self.eat_keyword("AS") {
            return Ok(Some(self.identifier()?));
        }
        match self.peek() {
            Token::QuotedIdent(_) => Ok(Some(self.identifier()?)),
            Token::Ident(name) if !is_reserved(name) => Ok(Some(self.identifier()?)),
            _ => Ok(None),
        }
    }

    pub(crate) fn expr(&mut self) -> Result<Expr> {
        let mut left = self.and_expr()?;
        while self.eat_keyword("OR") {
            let right = self.and_expr()?;
            left = Expr::Binary(BinaryOp::Or, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and_expr(&mut self) -> Result<Expr> {
        let mut left = self.not_expr()?;
        while self.eat_keyword("AND") {
            let right = self.not_expr()?;
            left = Expr::Binary(BinaryOp::And, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn not_expr(&mut self) -> Result<Expr> {
        if self.eat_keyword("NOT") {
            return Ok(Expr::Unary(UnaryOp::Not, Box::new(self.not_expr()?)));
        }
        self.predicate()
    }

    fn predicate(&mut self) -> Result<Expr> {
        let left = self.additive()?;

        let comparison = match self.peek() {
            Token::Symbol("=") => Some(BinaryOp::Eq),
            Token::Symbol("<>") | Token::Symbol("!=") => Some(BinaryOp::Ne),
            Token::Symbol("<") => Some(BinaryOp::Lt),
            Token::Symbol("<=") => Some(BinaryOp::Le),
            Token::Symbol(">") => Some(BinaryOp::Gt),
            Token::Symbol(">=") => Some(BinaryOp::Ge),
            _ => None,
        };
        if let Some(op) = comparison {
            self.advance();
            let right = self.additive()?;
            return Ok(Expr::Binary(op, Box::new(left), Box::new(right)));
        }

        if self.eat_keyword("IS") {
            let negated = self.eat_keyword("NOT");
            self.expect_keyword("NULL")?;
            return Ok(Expr::IsNull {
                expr: Box::new(left),
                negated,
            });
        }

        let negated = self.eat_keyword("NOT");
        if self.eat_keyword("LIKE") || self.eat_keyword("ILIKE") {
            let pattern = self.additive()?;
            return Ok(Expr::Like {
                expr: Box::new(left),
                pattern: Box::new(pattern),
                negated,
            });
        }
        if self.eat_keyword("IN") {
            self.expect_symbol("(")?;
            let mut list = vec![self.additive()?];
            while self.eat_symbol(",") {
                list.push(self.additive()?);
            }
            self.expect_symbol(")")?;
            return Ok(Expr::InList {
                expr: Box::new(left),
                list,
                negated,
            });
        }
        if self.eat_keyword("BETWEEN") {
            let low = self.additive()?;
            self.expect_keyword("AND")?;
            let high = self.additive()?;
            return Ok(Expr::Between {
                expr: Box::new(left),
                low: Box::new(low),
                high: Box::new(high),
                negated,
            });
        }
        if negated {
            return self.error("expected LIKE, IN or BETWEEN after NOT");
        }
        Ok(left)
    }

    fn additive(&mut self) -> Result<Expr> {
        let mut left = self.multiplicative()?;
        loop {
            let op = match self.peek() {
                Token::Symbol("+") => BinaryOp::Add,
                Token::Symbol("-") => BinaryOp::Sub,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.multiplicative()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn multiplicative(&mut self) -> Result<Expr> {
        let mut left = self.unary()?;
        loop {
            let op = match self.peek() {
                Token::Symbol("*") => BinaryOp::Mul,
                Token::Symbol("/") => BinaryOp::Div,
                Token::Symbol("%") => BinaryOp::Mod,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.unary()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn unary(&mut self) -> Result<Expr> {
        if self.eat_symbol("-") {
            return Ok(match self.unary()? {
                Expr::Literal(Value::Integer(v)) => Expr::Literal(Value::Integer(-v)),
                Expr::Literal(Value::Real(v)) => Expr::Literal(Value::Real(-v)),
                e => Expr::Unary(UnaryOp::Neg, Box::new(e)),
            });
        }
        if self.eat_symbol("+") {
            return self.unary();
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Expr> {
        match self.peek().clone() {
            Token::Integer(v) => {
                self.advance();
                Ok(Expr::Literal(Value::Integer(v)))
            }
            Token::Real(v) => {
                self.advance();
                Ok(Expr::Literal(Value::Real(v)))
            }
            Token::Str(s) => {
                self.advance();
                Ok(Expr::Literal(Value::String(s)))
            }
            Token::Symbol("(") => {
                self.advance();
                let e = self.expr()?;
                self.expect_symbol(")")?;
                Ok(e)
            }
            Token::Ident(name) if name.eq_ignore_ascii_case("NULL") => {
                self.advance();
                Ok(Expr::Literal(Value::Null))
            }
            Token::Ident(name)
                if name.eq_ignore_ascii_case("CAST")
                    && matches!(self.peek_at(1), Token::Symbol("(")) =>
            {
                self.advance();
                self.advance();
                let e = self.expr()?;
                self.expect_keyword("AS")?;
                let ty = self.cast_type()?;
                self.expect_symbol(")")?;
                Ok(Expr::Call(Function::Cast(ty), vec![e]))
            }
            Token::Ident(name) if matches!(self.peek_at(1), Token::Symbol("(")) => {
                let func = match name.to_ascii_uppercase().as_str() {
                    "CONCAT" => Function::Concat,
                    "SUBSTR" | "SUBSTRING" => Function::Substr,
                    "UPPER" => Function::Upper,
                    "LOWER" => Function::Lower,
                    _ => return self.error(format!("unknown function '{name}'")),
                };
                self.advance();
                self.advance();
                let mut args = Vec::new();
                if !self.eat_symbol(")") {
                    args.push(self.expr()?);
                    while self.eat_symbol(",") {
                        args.push(self.expr()?);
                    }
                    self.expect_symbol(")")?;
                }
                Ok(Expr::Call(func, args))
            }
            Token::Ident(_) | Token::QuotedIdent(_) => {
                let mut name = self.identifier()?;
                // `table.column`
                if self.eat_symbol(".") {
                    name = self.identifier()?;
                }
                Ok(Expr::Column(name))
            }
            other => self.error(format!("unexpected {}", describe(&other))),
        }
    }

    fn cast_type(&mut self) -> Result<FieldType> {
        let name = match self.advance() {
            Token::Ident(name) => name,
            other => return self.error(format!("expected a type, found {}", describe(&other))),
        };
        let ty = match name.to_ascii_uppercase().as_str() {
            "INTEGER" | "INT" | "SMALLINT" => FieldType::Integer,
            "INTEGER64" | "BIGINT" => FieldType::Integer64,
            "FLOAT" | "REAL" | "NUMERIC" | "DOUBLE" => FieldType::Real,
            "CHARACTER" | "CHAR" | "VARCHAR" | "STRING" | "TEXT" => FieldType::String,
            "DATE" => FieldType::Date,
            "TIMESTAMP" | "DATETIME" => FieldType::DateTime,
            _ => return self.error(format!("unknown type '{name}'")),
        };
        // optional width, e.g. CHARACTER(10)
        if self.eat_symbol("(") {
            while !self.eat_symbol(")") {
                if matches!(self.advance(), Token::Eof) {
                    return self.error("unterminated type width");
                }
            }
        }
        Ok(ty)
    }
}

fn is_reserved(name: &str) -> bool {
    RESERVED.iter().any(|kw| kw.eq_ignore_ascii_case(name))
}

fn describe(token: &Token) -> String {
    match token {
        Token::Ident(s) => format!("'{s}'"),
        Token::QuotedIdent(s) => format!("\"{s}\""),
        Token::Str(s) => format!("string '{s}'"),
        Token::Integer(v) => v.to_string(),
        Token::Real(v) => v.to_string(),
        Token::Symbol(s) => format!("'{s}'"),
        Token::Eof => "end of statement".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn col(name: &str) -> Box<Expr> {
        Box::new(Expr::Column(name.to_string()))
    }

    #[test]
    fn test_precedence() {
        let e = parse_expression("a = 1 OR b = 2 AND NOT c > 3").unwrap();
        let Expr::Binary(BinaryOp::Or, _, right) = e else {
            panic!("expected OR at the top");
        };
        assert!(matches!(*right, Expr::Binary(BinaryOp::And, _, _)));

        let e = parse_expression("x + 2 * 3").unwrap();
        assert_eq!(
            e,
            Expr::Binary(
                BinaryOp::Add,
                col("x"),
                Box::new(Expr::Binary(
                    BinaryOp::Mul,
                    Box::new(Expr::Literal(Value::Integer(2))),
                    Box::new(Expr::Literal(Value::Integer(3)))
                ))
            )
        );
    }

    #[test]
    fn test_predicates() {
        assert!(matches!(
            parse_expression("name NOT LIKE 'a%'").unwrap(),
            Expr::Like { negated: true, .. }
        ));
        assert!(matches!(
            parse_expression("eas_id IN (1, 2, -3)").unwrap(),
            Expr::InList { ref list, negated: false, .. } if list.len() == 3
        ));
        assert!(matches!(
            parse_expression("area BETWEEN 1 AND 2").unwrap(),
            Expr::Between { negated: false, .. }
        ));
        assert!(matches!(
            parse_expression("x IS NOT NULL").unwrap(),
            Expr::IsNull { negated: true, .. }
        ));
    }

    #[test]
    fn test_select() {
        let s = parse_select(
            "SELECT eas_id AS id, \"PRFEDEA\" FROM poly WHERE area > 100 ORDER BY eas_id DESC LIMIT 5 OFFSET 2;",
        )
        .unwrap();
        assert_eq!(s.table, "poly");
        assert_eq!(s.items.len(), 2);
        assert!(matches!(
            &s.items[0],
            SelectItem::Expr { alias: Some(a), .. } if a == "id"
        ));
        assert!(s.where_clause.is_some());
        assert!(!s.order_by[0].ascending);
        assert_eq!(s.limit, Some(5));
        assert_eq!(s.offset, 2);
    }

    #[test]
    fn test_select_aggregates() {
        let s = parse_select("SELECT COUNT(*), MAX(area) FROM poly").unwrap();
        assert!(matches!(
            s.items[0],
            SelectItem::Aggregate { func: Aggregate::Count, arg: None, .. }
        ));
        assert!(matches!(
            s.items[1],
            SelectItem::Aggregate { func: Aggregate::Max, arg: Some(_), .. }
        ));
    }

    #[test]
    fn test_errors_report_position() {
        let err = parse_select("SELECT * FORM poly").unwrap_err();
        assert!(matches!(err, GeoError::SqlError { position: 9, .. }));
        assert!(parse_expression("a = ").is_err());
        assert!(parse_expression("a NOT 3").is_err());
        assert!(parse_select("SELECT * FROM poly LIMIT -1").is_err());
    }
}
