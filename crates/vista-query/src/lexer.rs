//! Tokenizer for predicate text.

use std::iter::Peekable;
use std::str::CharIndices;

use crate::error::{QueryError, QueryResult};
use crate::filter::CompareOp;

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Token {
    /// Property name or keyword; keywords are recognised by the parser.
    Ident(String),
    Dot,
    Int(i64),
    Float(f64),
    Str(String),
    /// Positional argument `$n`.
    Arg(usize),
    Compare(CompareOp),
    And,
    Or,
    Not,
    LParen,
    RParen,
    /// The `[c]` modifier.
    CaseInsensitive,
}

pub(crate) fn tokenize(text: &str) -> QueryResult<Vec<Token>> {
    Lexer {
        text,
        chars: text.char_indices().peekable(),
    }
    .run()
}

struct Lexer<'a> {
    text: &'a str,
    chars: Peekable<CharIndices<'a>>,
}

impl<'a> Lexer<'a> {
    fn run(mut self) -> QueryResult<Vec<Token>> {
        let mut tokens = Vec::new();
        while let Some(&(pos, c)) = self.chars.peek() {
            let token = match c {
                c if c.is_whitespace() => {
                    self.chars.next();
                    continue;
                }
                '(' => self.single(Token::LParen),
                ')' => self.single(Token::RParen),
                '.' => self.single(Token::Dot),
                '=' => {
                    self.chars.next();
                    self.eat('=');
                    Token::Compare(CompareOp::Eq)
                }
                '!' => {
                    self.chars.next();
                    if self.eat('=') {
                        Token::Compare(CompareOp::Ne)
                    } else {
                        Token::Not
                    }
                }
                '<' => {
                    self.chars.next();
                    if self.eat('=') {
                        Token::Compare(CompareOp::Le)
                    } else if self.eat('>') {
                        Token::Compare(CompareOp::Ne)
                    } else {
                        Token::Compare(CompareOp::Lt)
                    }
                }
                '>' => {
                    self.chars.next();
                    if self.eat('=') {
                        Token::Compare(CompareOp::Ge)
                    } else {
                        Token::Compare(CompareOp::Gt)
                    }
                }
                '&' => self.pair('&', Token::And)?,
                '|' => self.pair('|', Token::Or)?,
                '[' => self.modifier(pos)?,
                '"' | '\'' => self.string(c)?,
                '$' => self.argument(pos)?,
                c if c.is_ascii_digit() || c == '-' => self.number(pos)?,
                c if c.is_alphabetic() || c == '_' => self.ident(pos),
                other => {
                    return Err(QueryError::invalid(format!(
                        "unexpected character '{other}' at offset {pos}"
                    )))
                }
            };
            tokens.push(token);
        }
        Ok(tokens)
    }

    fn single(&mut self, token: Token) -> Token {
        self.chars.next();
        token
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.chars.peek().map(|&(_, c)| c) == Some(expected) {
            self.chars.next();
            true
        } else {
            false
        }
    }

    fn pair(&mut self, c: char, token: Token) -> QueryResult<Token> {
        self.chars.next();
        if self.eat(c) {
            Ok(token)
        } else {
            Err(QueryError::invalid(format!("expected '{c}{c}'")))
        }
    }

    fn modifier(&mut self, pos: usize) -> QueryResult<Token> {
        self.chars.next();
        let ok = matches!(self.chars.next(), Some((_, 'c' | 'C'))) && self.eat(']');
        if ok {
            Ok(Token::CaseInsensitive)
        } else {
            Err(QueryError::invalid(format!(
                "unknown modifier at offset {pos}; only [c] is supported"
            )))
        }
    }

    fn string(&mut self, quote: char) -> QueryResult<Token> {
        self.chars.next();
        let mut out = String::new();
        while let Some((_, c)) = self.chars.next() {
            match c {
                c if c == quote => return Ok(Token::Str(out)),
                '\\' => match self.chars.next() {
                    Some((_, 'n')) => out.push('\n'),
                    Some((_, 't')) => out.push('\t'),
                    Some((_, escaped)) => out.push(escaped),
                    None => break,
                },
                c => out.push(c),
            }
        }
        Err(QueryError::invalid("unterminated string literal"))
    }

    fn argument(&mut self, pos: usize) -> QueryResult<Token> {
        self.chars.next();
        let digits = self.take_while(|c| c.is_ascii_digit());
        digits
            .parse()
            .map(Token::Arg)
            .map_err(|_| QueryError::invalid(format!("expected argument index after '$' at offset {pos}")))
    }

    fn number(&mut self, start: usize) -> QueryResult<Token> {
        self.chars.next();
        self.take_while(|c| c.is_ascii_digit());
        let mut float = false;
        if self.chars.peek().map(|&(_, c)| c) == Some('.') {
            float = true;
            self.chars.next();
            self.take_while(|c| c.is_ascii_digit());
        }
        if matches!(self.chars.peek(), Some((_, 'e' | 'E'))) {
            float = true;
            self.chars.next();
            if matches!(self.chars.peek(), Some((_, '+' | '-'))) {
                self.chars.next();
            }
            self.take_while(|c| c.is_ascii_digit());
        }
        let end = self.offset();
        let literal: &'a str = &self.text[start..end];
        let bad = || QueryError::invalid(format!("malformed number '{literal}'"));
        if float {
            literal.parse().map(Token::Float).map_err(|_| bad())
        } else {
            literal.parse().map(Token::Int).map_err(|_| bad())
        }
    }

    fn ident(&mut self, start: usize) -> Token {
        self.take_while(|c| c.is_alphanumeric() || c == '_');
        let end = self.offset();
        Token::Ident(self.text[start..end].to_string())
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> &'a str {
        let start = self.offset();
        while self.chars.peek().is_some_and(|&(_, c)| pred(c)) {
            self.chars.next();
        }
        let end = self.offset();
        &self.text[start..end]
    }

    fn offset(&mut self) -> usize {
        self.chars.peek().map_or(self.text.len(), |&(i, _)| i)
    }
}
