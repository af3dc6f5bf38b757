use super::lexer::Token;
use super::EvalError;

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Expr {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Ident(String),
    Array(Vec<Expr>),
    Object(Vec<(String, Expr)>),
    Member(Box<Expr>, String),
    Index(Box<Expr>, Box<Expr>),
    Call(Box<Expr>, Vec<Expr>),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Ternary(Box<Expr>, Box<Expr>, Box<Expr>),
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum UnaryOp {
    Not,
    Neg,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
}

pub(crate) fn parse(src: &str, tokens: &[Token]) -> Result<Expr, EvalError> {
    let mut parser = Parser {
        src,
        tokens,
        pos: 0,
    };
    let expr = parser.ternary()?;
    if parser.pos != tokens.len() {
        return Err(EvalError::parse(src, "trailing tokens"));
    }
    Ok(expr)
}

struct Parser<'a> {
    src: &'a str,
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> Parser<'a> {
    // references carry the token slice's lifetime, not the borrow of self
    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos)
    }

    fn bump(&mut self) -> Option<&'a Token> {
        let token = self.tokens.get(self.pos);
        self.pos += 1;
        token
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &Token, what: &str) -> Result<(), EvalError> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(EvalError::parse(self.src, &format!("expected {what}")))
        }
    }

    fn ternary(&mut self) -> Result<Expr, EvalError> {
        let condition = self.or()?;
        if self.eat(&Token::Question) {
            let then = self.ternary()?;
            self.expect(&Token::Colon, "`:`")?;
            let otherwise = self.ternary()?;
            return Ok(Expr::Ternary(
                Box::new(condition),
                Box::new(then),
                Box::new(otherwise),
            ));
        }
        Ok(condition)
    }

    fn or(&mut self) -> Result<Expr, EvalError> {
        let mut left = self.and()?;
        while self.eat(&Token::OrOr) {
            let right = self.and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and(&mut self) -> Result<Expr, EvalError> {
        let mut left = self.equality()?;
        while self.eat(&Token::AndAnd) {
            let right = self.equality()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn equality(&mut self) -> Result<Expr, EvalError> {
        let mut left = self.comparison()?;
        loop {
            let op = match self.peek() {
                Some(Token::EqEq) => BinaryOp::Eq,
                Some(Token::NotEq) => BinaryOp::NotEq,
                _ => break,
            };
            self.pos += 1;
            let right = self.comparison()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn comparison(&mut self) -> Result<Expr, EvalError> {
        let mut left = self.additive()?;
        loop {
            let op = match self.peek() {
                Some(Token::Lt) => BinaryOp::Lt,
                Some(Token::Le) => BinaryOp::Le,
                Some(Token::Gt) => BinaryOp::Gt,
                Some(Token::Ge) => BinaryOp::Ge,
                _ => break,
            };
            self.pos += 1;
            let right = self.additive()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn additive(&mut self) -> Result<Expr, EvalError> {
        let mut left = self.multiplicative()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => break,
            };
            self.pos += 1;
            let right = self.multiplicative()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn multiplicative(&mut self) -> Result<Expr, EvalError> {
        let mut left = self.unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Div,
                Some(Token::Percent) => BinaryOp::Rem,
                _ => break,
            };
            self.pos += 1;
            let right = self.unary()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn unary(&mut self) -> Result<Expr, EvalError> {
        if self.eat(&Token::Bang) {
            return Ok(Expr::Unary(UnaryOp::Not, Box::new(self.unary()?)));
        }
        if self.eat(&Token::Minus) {
            return Ok(Expr::Unary(UnaryOp::Neg, Box::new(self.unary()?)));
        }
        self.postfix()
    }

    fn postfix(&mut self) -> Result<Expr, EvalError> {
        let mut expr = self.primary()?;
        loop {
            if self.eat(&Token::Dot) {
                match self.bump() {
                    Some(Token::Ident(name)) => {
                        expr = Expr::Member(Box::new(expr), name.clone());
                    }
                    _ => return Err(EvalError::parse(self.src, "expected property name")),
                }
            } else if self.eat(&Token::LBracket) {
                let index = self.ternary()?;
                self.expect(&Token::RBracket, "`]`")?;
                expr = Expr::Index(Box::new(expr), Box::new(index));
            } else if self.eat(&Token::LParen) {
                let mut args = Vec::new();
                if !self.eat(&Token::RParen) {
                    loop {
                        args.push(self.ternary()?);
                        if !self.eat(&Token::Comma) {
                            break;
                        }
                    }
                    self.expect(&Token::RParen, "`)`")?;
                }
                expr = Expr::Call(Box::new(expr), args);
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn primary(&mut self) -> Result<Expr, EvalError> {
        let token = self
            .bump()
            .ok_or_else(|| EvalError::parse(self.src, "unexpected end of expression"))?
            .clone();
        match token {
            Token::Null => Ok(Expr::Null),
            Token::True => Ok(Expr::Bool(true)),
            Token::False => Ok(Expr::Bool(false)),
            Token::Int(n) => Ok(Expr::Int(n)),
            Token::Float(n) => Ok(Expr::Float(n)),
            Token::Str(s) => Ok(Expr::Str(s)),
            Token::Ident(name) => Ok(Expr::Ident(name)),
            Token::LParen => {
                let inner = self.ternary()?;
                self.expect(&Token::RParen, "`)`")?;
                Ok(inner)
            }
            Token::LBracket => {
                let mut items = Vec::new();
                if !self.eat(&Token::RBracket) {
                    loop {
                        items.push(self.ternary()?);
                        if !self.eat(&Token::Comma) {
                            break;
                        }
                    }
                    self.expect(&Token::RBracket, "`]`")?;
                }
                Ok(Expr::Array(items))
            }
            Token::LBrace => {
                let mut entries = Vec::new();
                if !self.eat(&Token::RBrace) {
                    loop {
                        let key = match self.bump() {
                            Some(Token::Ident(name)) => name.clone(),
                            Some(Token::Str(s)) => s.clone(),
                            _ => return Err(EvalError::parse(self.src, "expected object key")),
                        };
                        self.expect(&Token::Colon, "`:`")?;
                        entries.push((key, self.ternary()?));
                        if !self.eat(&Token::Comma) {
                            break;
                        }
                    }
                    self.expect(&Token::RBrace, "`}`")?;
                }
                Ok(Expr::Object(entries))
            }
            _ => Err(EvalError::parse(self.src, "unexpected token")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::lexer::tokenize;
    use super::*;

    fn parse_src(src: &str) -> Expr {
        parse(src, &tokenize(src).unwrap()).unwrap()
    }

    #[test]
    fn member_and_index_chains() {
        let expr = parse_src("items[0].title");
        assert_eq!(
            expr,
            Expr::Member(
                Box::new(Expr::Index(
                    Box::new(Expr::Ident("items".into())),
                    Box::new(Expr::Int(0)),
                )),
                "title".into(),
            )
        );
    }

    #[test]
    fn precedence_of_logic_over_comparison() {
        // parses as (a > 1) && (b < 2)
        let expr = parse_src("a > 1 && b < 2");
        assert!(matches!(expr, Expr::And(_, _)));
    }

    #[test]
    fn ternary_nests_to_the_right() {
        let expr = parse_src("a ? 1 : b ? 2 : 3");
        if let Expr::Ternary(_, _, otherwise) = expr {
            assert!(matches!(*otherwise, Expr::Ternary(_, _, _)));
        } else {
            panic!("expected ternary");
        }
    }

    #[test]
    fn call_with_arguments() {
        let expr = parse_src("toggle(index, true)");
        if let Expr::Call(callee, args) = expr {
            assert_eq!(*callee, Expr::Ident("toggle".into()));
            assert_eq!(args.len(), 2);
        } else {
            panic!("expected call");
        }
    }

    #[test]
    fn object_and_array_literals() {
        let expr = parse_src("{ active: done, 'x-y': 1, list: [1, 2] }");
        if let Expr::Object(entries) = expr {
            assert_eq!(entries.len(), 3);
            assert_eq!(entries[1].0, "x-y");
        } else {
            panic!("expected object");
        }
    }

    #[test]
    fn rejects_trailing_garbage() {
        let tokens = tokenize("a b").unwrap();
        assert!(parse("a b", &tokens).is_err());
    }
}
