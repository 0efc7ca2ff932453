//! 数量表达式词法分析

use crate::error::ExpressionError;
use std::fmt;

/// 词法单元
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Number(f64),
    Identifier(String),
    Plus,
    Minus,
    Star,
    Slash,
    LeftParen,
    RightParen,
    Eof,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Number(n) => write!(f, "{}", n),
            Token::Identifier(name) => write!(f, "{}", name),
            Token::Plus => write!(f, "+"),
            Token::Minus => write!(f, "-"),
            Token::Star => write!(f, "*"),
            Token::Slash => write!(f, "/"),
            Token::LeftParen => write!(f, "("),
            Token::RightParen => write!(f, ")"),
            Token::Eof => write!(f, "EOF"),
        }
    }
}

/// 带位置信息的词法单元（位置为字符偏移）
#[derive(Debug, Clone, PartialEq)]
pub struct SpannedToken {
    pub token: Token,
    pub position: usize,
}

/// 词法分析器
pub struct Lexer {
    input: Vec<char>,
    position: usize,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        Self {
            input: input.chars().collect(),
            position: 0,
        }
    }

    /// 将整个输入切分为词法单元，末尾总是 `Eof`
    pub fn tokenize(mut self) -> Result<Vec<SpannedToken>, ExpressionError> {
        let mut tokens = Vec::new();
        loop {
            let spanned = self.next_token()?;
            let done = spanned.token == Token::Eof;
            tokens.push(spanned);
            if done {
                return Ok(tokens);
            }
        }
    }

    fn current(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    fn peek(&self) -> Option<char> {
        self.input.get(self.position + 1).copied()
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.current(), Some(ch) if ch.is_whitespace()) {
            self.position += 1;
        }
    }

    fn read_number(&mut self) -> Result<Token, ExpressionError> {
        let start = self.position;
        let mut seen_dot = false;

        while let Some(ch) = self.current() {
            if ch.is_ascii_digit() {
                self.position += 1;
            } else if ch == '.' && !seen_dot {
                seen_dot = true;
                self.position += 1;
            } else {
                break;
            }
        }

        let text: String = self.input[start..self.position].iter().collect();
        text.parse::<f64>()
            .map(Token::Number)
            .map_err(|_| ExpressionError::parse(start, format!("无效的数值 '{}'", text)))
    }

    fn read_identifier(&mut self) -> Token {
        let start = self.position;
        while matches!(self.current(), Some(ch) if ch.is_ascii_alphanumeric() || ch == '_') {
            self.position += 1;
        }
        Token::Identifier(self.input[start..self.position].iter().collect())
    }

    fn single(&mut self, token: Token) -> Token {
        self.position += 1;
        token
    }

    fn next_token(&mut self) -> Result<SpannedToken, ExpressionError> {
        self.skip_whitespace();
        let position = self.position;

        let token = match self.current() {
            None => Token::Eof,
            Some(ch) => match ch {
                '0'..='9' => self.read_number()?,
                '.' if matches!(self.peek(), Some(d) if d.is_ascii_digit()) => self.read_number()?,
                'a'..='z' | 'A'..='Z' | '_' => self.read_identifier(),
                '+' => self.single(Token::Plus),
                '-' => self.single(Token::Minus),
                '*' => self.single(Token::Star),
                '/' => self.single(Token::Slash),
                '(' => self.single(Token::LeftParen),
                ')' => self.single(Token::RightParen),
                other => {
                    return Err(ExpressionError::parse(
                        position,
                        format!("非法字符 '{}'", other),
                    ));
                }
            },
        };

        Ok(SpannedToken { token, position })
    }
}
