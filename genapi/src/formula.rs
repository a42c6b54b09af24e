/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! The expression engine behind `SwissKnife` and `Converter` nodes.
//!
//! Formulas are parsed once into an [`Expr`] tree and evaluated against a
//! variable environment. Integer operands stay integers until an
//! operation forces promotion to float. Malformed text fails with
//! `InvalidSyntax` instead of panicking, since formulas come from device
//! XML we don't control.

#![allow(
    clippy::missing_panics_doc,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation
)]

use std::{borrow::Borrow, collections::HashMap, fmt, hash::Hash, str::FromStr};

use super::{GenApiError, GenApiResult};

#[derive(Debug, Clone, PartialEq)]
pub struct Formula {
    pub(crate) expr: Expr,
}

impl Formula {
    #[must_use]
    pub fn new(expr: Expr) -> Self {
        Self { expr }
    }

    #[must_use]
    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    pub fn eval<K, V>(&self, var_env: &HashMap<K, V>) -> GenApiResult<EvaluationResult>
    where
        K: Borrow<str> + Eq + Hash + fmt::Debug,
        V: Borrow<Expr> + fmt::Debug,
    {
        self.expr.eval(var_env)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    BinOp {
        kind: BinOpKind,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    UnOp {
        kind: UnOpKind,
        expr: Box<Expr>,
    },
    If {
        cond: Box<Expr>,
        then: Box<Expr>,
        else_: Box<Expr>,
    },
    Integer(i64),
    Float(f64),
    Ident(String),
}

impl From<i64> for Expr {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

impl From<f64> for Expr {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<bool> for Expr {
    fn from(b: bool) -> Self {
        Self::Integer(i64::from(b))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EvaluationResult {
    Integer(i64),
    Float(f64),
}

impl From<i64> for EvaluationResult {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

impl From<f64> for EvaluationResult {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<bool> for EvaluationResult {
    fn from(b: bool) -> Self {
        Self::Integer(i64::from(b))
    }
}

impl EvaluationResult {
    #[must_use]
    pub fn as_integer(self) -> i64 {
        match self {
            Self::Integer(i) => i,
            Self::Float(f) => f as i64,
        }
    }

    #[must_use]
    pub fn as_float(self) -> f64 {
        match self {
            Self::Integer(i) => i as f64,
            Self::Float(f) => f,
        }
    }

    #[must_use]
    pub fn as_bool(self) -> bool {
        match self {
            Self::Integer(i) => i != 0,
            Self::Float(f) => f != 0.,
        }
    }

    fn is_integer(self) -> bool {
        matches!(self, Self::Integer(..))
    }
}

impl Expr {
    #[tracing::instrument(level = "trace")]
    pub fn eval<K, V>(&self, var_env: &HashMap<K, V>) -> GenApiResult<EvaluationResult>
    where
        K: Borrow<str> + Eq + Hash + fmt::Debug,
        V: Borrow<Expr> + fmt::Debug,
    {
        match self {
            Self::BinOp { kind, lhs, rhs } => eval_binop(*kind, lhs, rhs, var_env),
            Self::UnOp { kind, expr } => eval_unop(*kind, expr, var_env),
            Self::If { cond, then, else_ } => {
                if cond.eval(var_env)?.as_bool() {
                    then.eval(var_env)
                } else {
                    else_.eval(var_env)
                }
            }
            &Self::Integer(i) => Ok(i.into()),
            &Self::Float(f) => Ok(f.into()),
            Self::Ident(s) => var_env
                .get(s.as_str())
                .ok_or_else(|| {
                    GenApiError::invalid_syntax(
                        format!("variable `{}` not bound in the formula environment", s).into(),
                    )
                })?
                .borrow()
                .eval(var_env),
        }
    }
}

fn eval_binop<K, V>(
    op: BinOpKind,
    lhs: &Expr,
    rhs: &Expr,
    var_env: &HashMap<K, V>,
) -> GenApiResult<EvaluationResult>
where
    K: Borrow<str> + Eq + Hash + fmt::Debug,
    V: Borrow<Expr> + fmt::Debug,
{
    use std::ops::{Add, Mul, Sub};

    // Logical operators short-circuit.
    match op {
        BinOpKind::And => {
            return Ok((lhs.eval(var_env)?.as_bool() && rhs.eval(var_env)?.as_bool()).into())
        }
        BinOpKind::Or => {
            return Ok((lhs.eval(var_env)?.as_bool() || rhs.eval(var_env)?.as_bool()).into())
        }
        _ => {}
    }

    let lhs = lhs.eval(var_env)?;
    let rhs = rhs.eval(var_env)?;
    let both_int = lhs.is_integer() && rhs.is_integer();

    macro_rules! arith {
        ($fint:ident, $ffloat:ident) => {
            if both_int {
                lhs.as_integer().$fint(rhs.as_integer()).0.into()
            } else {
                lhs.as_float().$ffloat(rhs.as_float()).into()
            }
        };
    }

    macro_rules! cmp {
        ($f:ident) => {
            if both_int {
                lhs.as_integer().$f(&rhs.as_integer()).into()
            } else {
                lhs.as_float().$f(&rhs.as_float()).into()
            }
        };
    }

    Ok(match op {
        BinOpKind::Add => arith!(overflowing_add, add),
        BinOpKind::Sub => arith!(overflowing_sub, sub),
        BinOpKind::Mul => arith!(overflowing_mul, mul),
        BinOpKind::Div => {
            if both_int {
                let divisor = rhs.as_integer();
                if divisor == 0 {
                    return Err(GenApiError::invalid_syntax(
                        "division by zero in formula".into(),
                    ));
                }
                lhs.as_integer().overflowing_div(divisor).0.into()
            } else {
                (lhs.as_float() / rhs.as_float()).into()
            }
        }
        BinOpKind::Rem => {
            let divisor = rhs.as_integer();
            if divisor == 0 {
                return Err(GenApiError::invalid_syntax(
                    "remainder by zero in formula".into(),
                ));
            }
            lhs.as_integer().overflowing_rem(divisor).0.into()
        }
        BinOpKind::Pow => {
            if both_int && rhs.as_integer() >= 0 {
                lhs.as_integer()
                    .overflowing_pow(rhs.as_integer() as u32)
                    .0
                    .into()
            } else {
                lhs.as_float().powf(rhs.as_float()).into()
            }
        }
        BinOpKind::Eq => cmp!(eq),
        BinOpKind::Ne => cmp!(ne),
        BinOpKind::Lt => cmp!(lt),
        BinOpKind::Le => cmp!(le),
        BinOpKind::Gt => cmp!(gt),
        BinOpKind::Ge => cmp!(ge),
        BinOpKind::Shl => lhs
            .as_integer()
            .overflowing_shl(rhs.as_integer() as u32)
            .0
            .into(),
        BinOpKind::Shr => lhs
            .as_integer()
            .overflowing_shr(rhs.as_integer() as u32)
            .0
            .into(),
        BinOpKind::BitAnd => (lhs.as_integer() & rhs.as_integer()).into(),
        BinOpKind::BitOr => (lhs.as_integer() | rhs.as_integer()).into(),
        BinOpKind::Xor => (lhs.as_integer() ^ rhs.as_integer()).into(),
        BinOpKind::And | BinOpKind::Or => unreachable!(),
    })
}

fn eval_unop<K, V>(
    op: UnOpKind,
    expr: &Expr,
    var_env: &HashMap<K, V>,
) -> GenApiResult<EvaluationResult>
where
    K: Borrow<str> + Eq + Hash + fmt::Debug,
    V: Borrow<Expr> + fmt::Debug,
{
    use std::ops::Neg;

    let res = expr.eval(var_env)?;

    macro_rules! per_kind {
        ($f:ident) => {
            match res {
                EvaluationResult::Integer(i) => EvaluationResult::from(i.$f()),
                EvaluationResult::Float(f) => EvaluationResult::from(f.$f()),
            }
        };
    }

    Ok(match op {
        UnOpKind::Not => (!res.as_integer()).into(),
        UnOpKind::Abs => per_kind!(abs),
        UnOpKind::Sgn => per_kind!(signum),
        UnOpKind::Neg => per_kind!(neg),
        UnOpKind::Sin => res.as_float().sin().into(),
        UnOpKind::Cos => res.as_float().cos().into(),
        UnOpKind::Tan => res.as_float().tan().into(),
        UnOpKind::Asin => res.as_float().asin().into(),
        UnOpKind::Acos => res.as_float().acos().into(),
        UnOpKind::Atan => res.as_float().atan().into(),
        UnOpKind::Exp => res.as_float().exp().into(),
        UnOpKind::Ln => res.as_float().ln().into(),
        UnOpKind::Lg => res.as_float().log10().into(),
        UnOpKind::Sqrt => res.as_float().sqrt().into(),
        UnOpKind::Trunc => res.as_float().trunc().into(),
        UnOpKind::Floor => res.as_float().floor().into(),
        UnOpKind::Ceil => res.as_float().ceil().into(),
        UnOpKind::Round => res.as_float().round().into(),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOpKind {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Pow,
    Shl,
    Shr,
    And,
    Or,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    BitAnd,
    BitOr,
    Xor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOpKind {
    Not,
    Abs,
    Sgn,
    Neg,
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
    Exp,
    Ln,
    Lg,
    Sqrt,
    Trunc,
    Floor,
    Ceil,
    Round,
}

#[tracing::instrument(level = "trace")]
pub fn parse(s: &str) -> GenApiResult<Expr> {
    let tokens = Lexer::new(s).tokenize()?;
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.expr()?;
    if parser.peek().is_some() {
        return Err(GenApiError::invalid_syntax(
            format!("trailing input in formula `{}`", s).into(),
        ));
    }
    Ok(expr)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    /// Ternary `cond ? then : else`, right associative, lowest binding.
    fn expr(&mut self) -> GenApiResult<Expr> {
        let cond = self.logical_or()?;
        if self.eat(&Token::Question) {
            let then = self.expr()?;
            self.expect(&Token::Colon)?;
            let else_ = self.expr()?;
            Ok(Expr::If {
                cond: cond.into(),
                then: then.into(),
                else_: else_.into(),
            })
        } else {
            Ok(cond)
        }
    }

    fn logical_or(&mut self) -> GenApiResult<Expr> {
        self.binop_chain(Self::logical_and, &[(Token::DoubleOr, BinOpKind::Or)])
    }

    fn logical_and(&mut self) -> GenApiResult<Expr> {
        self.binop_chain(Self::bit_or, &[(Token::DoubleAnd, BinOpKind::And)])
    }

    fn bit_or(&mut self) -> GenApiResult<Expr> {
        self.binop_chain(Self::bit_xor, &[(Token::Or, BinOpKind::BitOr)])
    }

    fn bit_xor(&mut self) -> GenApiResult<Expr> {
        self.binop_chain(Self::bit_and, &[(Token::Caret, BinOpKind::Xor)])
    }

    fn bit_and(&mut self) -> GenApiResult<Expr> {
        self.binop_chain(Self::equality, &[(Token::And, BinOpKind::BitAnd)])
    }

    fn equality(&mut self) -> GenApiResult<Expr> {
        self.binop_chain(
            Self::relational,
            &[(Token::Eq, BinOpKind::Eq), (Token::Ne, BinOpKind::Ne)],
        )
    }

    fn relational(&mut self) -> GenApiResult<Expr> {
        self.binop_chain(
            Self::shift,
            &[
                (Token::Lt, BinOpKind::Lt),
                (Token::Le, BinOpKind::Le),
                (Token::Gt, BinOpKind::Gt),
                (Token::Ge, BinOpKind::Ge),
            ],
        )
    }

    fn shift(&mut self) -> GenApiResult<Expr> {
        self.binop_chain(
            Self::additive,
            &[(Token::Shl, BinOpKind::Shl), (Token::Shr, BinOpKind::Shr)],
        )
    }

    fn additive(&mut self) -> GenApiResult<Expr> {
        self.binop_chain(
            Self::multiplicative,
            &[(Token::Plus, BinOpKind::Add), (Token::Minus, BinOpKind::Sub)],
        )
    }

    fn multiplicative(&mut self) -> GenApiResult<Expr> {
        self.binop_chain(
            Self::unary,
            &[
                (Token::Star, BinOpKind::Mul),
                (Token::Slash, BinOpKind::Div),
                (Token::Percent, BinOpKind::Rem),
            ],
        )
    }

    fn binop_chain(
        &mut self,
        operand: fn(&mut Self) -> GenApiResult<Expr>,
        ops: &[(Token, BinOpKind)],
    ) -> GenApiResult<Expr> {
        let mut expr = operand(self)?;
        'outer: loop {
            for (token, kind) in ops {
                if self.eat(token) {
                    let rhs = operand(self)?;
                    expr = Expr::BinOp {
                        kind: *kind,
                        lhs: expr.into(),
                        rhs: rhs.into(),
                    };
                    continue 'outer;
                }
            }
            break Ok(expr);
        }
    }

    fn unary(&mut self) -> GenApiResult<Expr> {
        if self.eat(&Token::Tilde) {
            Ok(Expr::UnOp {
                kind: UnOpKind::Not,
                expr: self.unary()?.into(),
            })
        } else if self.eat(&Token::Minus) {
            Ok(Expr::UnOp {
                kind: UnOpKind::Neg,
                expr: self.unary()?.into(),
            })
        } else {
            // Unary `+` is a no-op.
            self.eat(&Token::Plus);
            self.power()
        }
    }

    /// `**`, right associative, binds tighter than unary minus.
    fn power(&mut self) -> GenApiResult<Expr> {
        let lhs = self.call()?;
        if self.eat(&Token::DoubleStar) {
            let rhs = self.power()?;
            Ok(Expr::BinOp {
                kind: BinOpKind::Pow,
                lhs: lhs.into(),
                rhs: rhs.into(),
            })
        } else {
            Ok(lhs)
        }
    }

    fn call(&mut self) -> GenApiResult<Expr> {
        if let Some(kind) = self.peek_function() {
            self.advance();
            self.expect(&Token::LParen)?;
            let expr = self.expr()?;
            self.expect(&Token::RParen)?;
            Ok(Expr::UnOp {
                kind,
                expr: expr.into(),
            })
        } else {
            self.primary()
        }
    }

    fn primary(&mut self) -> GenApiResult<Expr> {
        if self.eat(&Token::LParen) {
            let expr = self.expr()?;
            self.expect(&Token::RParen)?;
            return Ok(expr);
        }

        match self.peek().cloned() {
            Some(Token::Integer(i)) => {
                self.advance();
                Ok(Expr::Integer(i))
            }
            Some(Token::Float(f)) => {
                self.advance();
                Ok(Expr::Float(f))
            }
            Some(Token::Ident(s)) => {
                self.advance();
                Ok(match s.as_str() {
                    "PI" => Expr::Float(std::f64::consts::PI),
                    "E" => Expr::Float(std::f64::consts::E),
                    "TRUE" => Expr::Integer(1),
                    "FALSE" => Expr::Integer(0),
                    _ => Expr::Ident(s),
                })
            }
            other => Err(GenApiError::invalid_syntax(
                format!("unexpected token in formula: {:?}", other).into(),
            )),
        }
    }

    fn peek_function(&self) -> Option<UnOpKind> {
        let s = match self.peek() {
            Some(Token::Ident(s)) => s,
            _ => return None,
        };
        Some(match s.as_str() {
            "NEG" => UnOpKind::Neg,
            "SIN" => UnOpKind::Sin,
            "COS" => UnOpKind::Cos,
            "TAN" => UnOpKind::Tan,
            "ASIN" => UnOpKind::Asin,
            "ACOS" => UnOpKind::Acos,
            "ATAN" => UnOpKind::Atan,
            "ABS" => UnOpKind::Abs,
            "SGN" => UnOpKind::Sgn,
            "EXP" => UnOpKind::Exp,
            "LN" => UnOpKind::Ln,
            "LG" => UnOpKind::Lg,
            "SQRT" => UnOpKind::Sqrt,
            "TRUNC" => UnOpKind::Trunc,
            "FLOOR" => UnOpKind::Floor,
            "CEIL" => UnOpKind::Ceil,
            "ROUND" => UnOpKind::Round,
            _ => return None,
        })
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) {
        self.pos += 1;
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &Token) -> GenApiResult<()> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(GenApiError::invalid_syntax(
                format!("expected {:?} in formula, found {:?}", token, self.peek()).into(),
            ))
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    LParen,
    RParen,
    Plus,
    Minus,
    Star,
    DoubleStar,
    Slash,
    Percent,
    And,
    DoubleAnd,
    Or,
    DoubleOr,
    Caret,
    Tilde,
    Eq,
    Ne,
    Colon,
    Question,
    Lt,
    Le,
    Gt,
    Ge,
    Shl,
    Shr,
    Ident(String),
    Float(f64),
    Integer(i64),
}

struct Lexer<'a> {
    src: &'a str,
    chars: Vec<char>,
    cur: usize,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        // Formulas come out of XML text, so entity escapes appear in the
        // operator positions. Expand them before tokenizing.
        let expanded = src
            .replace("&amp;", "&")
            .replace("&lt;", "<")
            .replace("&gt;", ">");
        Self {
            src,
            chars: expanded.chars().collect(),
            cur: 0,
        }
    }

    fn tokenize(mut self) -> GenApiResult<Vec<Token>> {
        let mut tokens = Vec::new();
        while let Some(token) = self.next_token()? {
            tokens.push(token);
        }
        Ok(tokens)
    }

    fn next_token(&mut self) -> GenApiResult<Option<Token>> {
        while self
            .peek_char()
            .map_or(false, |c| c.is_whitespace() || c.is_ascii_control())
        {
            self.cur += 1;
        }

        let c = match self.next_char() {
            Some(c) => c,
            None => return Ok(None),
        };

        let token = match c {
            '(' => Token::LParen,
            ')' => Token::RParen,
            '+' => Token::Plus,
            '-' => Token::Minus,
            '*' => {
                if self.eat_char('*') {
                    Token::DoubleStar
                } else {
                    Token::Star
                }
            }
            '/' => Token::Slash,
            '%' => Token::Percent,
            '&' => {
                if self.eat_char('&') {
                    Token::DoubleAnd
                } else {
                    Token::And
                }
            }
            '|' => {
                if self.eat_char('|') {
                    Token::DoubleOr
                } else {
                    Token::Or
                }
            }
            '^' => Token::Caret,
            '~' => Token::Tilde,
            '=' => Token::Eq,
            ':' => Token::Colon,
            '?' => Token::Question,
            '<' => {
                if self.eat_char('>') {
                    Token::Ne
                } else if self.eat_char('=') {
                    Token::Le
                } else if self.eat_char('<') {
                    Token::Shl
                } else {
                    Token::Lt
                }
            }
            '>' => {
                if self.eat_char('=') {
                    Token::Ge
                } else if self.eat_char('>') {
                    Token::Shr
                } else {
                    Token::Gt
                }
            }
            '.' => self.lex_number('.')?,
            c if c.is_ascii_digit() => self.lex_number(c)?,
            c if c.is_alphabetic() || c == '_' => {
                let mut ident = String::new();
                ident.push(c);
                while let Some(c) = self.peek_char() {
                    if c.is_alphanumeric() || c == '_' || c == '.' {
                        ident.push(c);
                        self.cur += 1;
                    } else {
                        break;
                    }
                }
                Token::Ident(ident)
            }
            c => {
                return Err(GenApiError::invalid_syntax(
                    format!("unexpected character `{}` in formula `{}`", c, self.src).into(),
                ))
            }
        };

        Ok(Some(token))
    }

    fn lex_number(&mut self, first: char) -> GenApiResult<Token> {
        if first == '0' && (self.eat_char('x') || self.eat_char('X')) {
            let mut digits = String::new();
            while let Some(c) = self.peek_char() {
                if c.is_ascii_hexdigit() {
                    digits.push(c);
                    self.cur += 1;
                } else {
                    break;
                }
            }
            return i64::from_str_radix(&digits, 16).map(Token::Integer).map_err(|_| {
                GenApiError::invalid_syntax(
                    format!("invalid hex literal in formula `{}`", self.src).into(),
                )
            });
        }

        let mut text = String::new();
        text.push(first);
        let mut is_integer = first != '.';
        while let Some(c) = self.peek_char() {
            if c.is_ascii_digit() {
                text.push(c);
                self.cur += 1;
            } else if c == '.' {
                is_integer = false;
                text.push(c);
                self.cur += 1;
            } else if c == 'e' || c == 'E' {
                is_integer = false;
                text.push(c);
                self.cur += 1;
                if let Some(sign @ ('+' | '-')) = self.peek_char() {
                    text.push(sign);
                    self.cur += 1;
                }
            } else {
                break;
            }
        }

        let result = if is_integer {
            i64::from_str(&text).map(Token::Integer).map_err(|_| ())
        } else {
            f64::from_str(&text).map(Token::Float).map_err(|_| ())
        };
        result.map_err(|_| {
            GenApiError::invalid_syntax(
                format!("invalid numeric literal `{}` in formula", text).into(),
            )
        })
    }

    fn peek_char(&self) -> Option<char> {
        self.chars.get(self.cur).copied()
    }

    fn next_char(&mut self) -> Option<char> {
        let c = self.peek_char()?;
        self.cur += 1;
        Some(c)
    }

    fn eat_char(&mut self, expected: char) -> bool {
        if self.peek_char() == Some(expected) {
            self.cur += 1;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(src: &str) -> EvaluationResult {
        let env: HashMap<&str, Expr> = HashMap::new();
        parse(src).unwrap().eval(&env).unwrap()
    }

    fn assert_int(src: &str, expected: i64) {
        match eval(src) {
            EvaluationResult::Integer(i) => assert_eq!(i, expected, "{}", src),
            other => panic!("{} evaluated to {:?}", src, other),
        }
    }

    #[test]
    fn arithmetic() {
        assert_int("(24+2)*8", 208);
        assert_int("1 + 2 * 3 - 6", 1);
        assert_int("10 % 3", 1);
        assert_int("2 * 3 ** 2", 18);
        assert_int("2 ** 3 ** 2", 512);
        assert_int("-2 ** 2", -4);
    }

    #[test]
    fn integer_result_stays_integer() {
        assert_eq!(eval("(24+2)*8"), EvaluationResult::Integer(208));
        assert!((eval("(24+2)*8").as_float() - 208.0).abs() < f64::EPSILON);
    }

    #[test]
    fn comparisons_and_logic() {
        assert_int("1=1?1:0", 1);
        assert_int("1=2?1:0", 0);
        assert_int("(1 <> 0) + (1 = 1)", 2);
        assert_int("(1 > 0) + (1 > 1) + (1 >= 1) + (1 >= 2)", 2);
        assert_int("(0 < 1) + (1 < 1) + (1 <= 1) + (2 <= 1)", 2);
        assert_int("1 || 1 && 0", 1);
        assert_int("TRUE && FALSE", 0);
    }

    #[test]
    fn bit_operations() {
        assert_int("0xff00 & 0xf0f0", 0xf000);
        assert_int("0xff00 | 0xf0f0", 0xfff0);
        assert_int("0xff00 ^ 0xf0f0", 0x0ff0);
        assert_int("1 << 2 + 2 >> 1", 8);
        assert_int("~0", -1);
    }

    #[test]
    fn functions_and_constants() {
        assert!((eval("SIN(PI/2.0)").as_float() - 1.0).abs() < 1e-12);
        assert!((eval("LN(E)").as_float() - 1.0).abs() < 1e-12);
        assert!((eval("SQRT(16.0)").as_float() - 4.0).abs() < f64::EPSILON);
        // Rounding functions promote to float; compare through the cast.
        assert_eq!(eval("FLOOR(1.9)").as_integer(), 1);
        assert_eq!(eval("CEIL(1.1)").as_integer(), 2);
        assert_eq!(eval("ROUND(2.5)").as_integer(), 3);
        assert_int("ABS(0-5)", 5);
        assert_int("SGN(0-3)", -1);
    }

    #[test]
    fn xml_entity_escapes() {
        assert_int("(0xff00 &amp; 0xf0f0) = 0xf000", 1);
        assert_int("(1 &lt; 2) + (1 &gt; 2)", 1);
    }

    #[test]
    fn variables() {
        let env: HashMap<&str, Expr> = vec![
            ("VAR1", Expr::Integer(4)),
            ("SENSOR.WIDTH", Expr::Integer(1024)),
        ]
        .into_iter()
        .collect();
        let res = parse("SENSOR.WIDTH / VAR1").unwrap().eval(&env).unwrap();
        assert_eq!(res, EvaluationResult::Integer(256));
    }

    #[test]
    fn malformed_input_is_rejected() {
        assert!(parse("1 +").is_err());
        assert!(parse("(1").is_err());
        assert!(parse("1 ? 2").is_err());
        assert!(parse("#").is_err());
        assert!(parse("1 2").is_err());
    }

    #[test]
    fn division_by_zero_is_an_error() {
        let env: HashMap<&str, Expr> = HashMap::new();
        assert!(parse("1/0").unwrap().eval(&env).is_err());
        assert!(parse("1%0").unwrap().eval(&env).is_err());
    }
}
