use crate::ast::{Argument, Arguments, Var};
use crate::lexer::{self, LexError, Token};

type Span = std::ops::Range<usize>;

/// Recursive-descent parser for call-argument expressions:
///
/// ```text
/// args := (arg (',' arg)*)?
/// arg  := var | '(' NAME (',' arg)* ')'
/// ```
pub struct Parser {
    tokens: Vec<(Token, Span)>,
    pos: usize,
    end: usize,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("Parse error at position {position}: {message}")]
pub struct ParseError {
    pub position: usize,
    pub message: String,
}

impl From<LexError> for ParseError {
    fn from(e: LexError) -> Self {
        ParseError { position: e.position, message: format!("unexpected '{}'. {}", e.snippet, e.suggestion) }
    }
}

type Result<T> = std::result::Result<T, ParseError>;

impl Parser {
    pub fn new(tokens: Vec<(Token, Span)>, end: usize) -> Self {
        Parser { tokens, pos: 0, end }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn position(&self) -> usize {
        self.tokens.get(self.pos).map(|(_, s)| s.start).unwrap_or(self.end)
    }

    fn advance(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).map(|(t, _)| t.clone());
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError { position: self.position(), message: message.into() }
    }

    fn expect(&mut self, expected: &Token) -> Result<()> {
        match self.peek() {
            Some(tok) if tok == expected => {
                self.advance();
                Ok(())
            }
            Some(tok) => Err(self.error(format!("expected {expected:?}, got {tok:?}"))),
            None => Err(self.error(format!("expected {expected:?}, got end of input"))),
        }
    }

    pub fn parse_list(&mut self) -> Result<Vec<Argument>> {
        let mut args = Vec::new();
        if self.peek().is_none() {
            return Ok(args);
        }
        args.push(self.parse_arg()?);
        while self.peek() == Some(&Token::Comma) {
            self.advance();
            args.push(self.parse_arg()?);
        }
        match self.peek() {
            None => Ok(args),
            Some(tok) => Err(self.error(format!("expected ',' or end of input, got {tok:?}"))),
        }
    }

    fn parse_arg(&mut self) -> Result<Argument> {
        let at = self.position();
        match self.advance() {
            Some(Token::Ident(name)) => name.parse::<Var>().map(Argument::Var).map_err(|e| ParseError {
                position: at,
                message: e.to_string(),
            }),
            Some(Token::LParen) => {
                let function = match self.advance() {
                    Some(Token::Ident(name)) => name,
                    Some(tok) => return Err(ParseError { position: at + 1, message: format!("expected function name, got {tok:?}") }),
                    None => return Err(self.error("expected function name, got end of input")),
                };
                let mut args = Vec::new();
                while self.peek() == Some(&Token::Comma) {
                    self.advance();
                    args.push(self.parse_arg()?);
                }
                self.expect(&Token::RParen)?;
                Ok(Argument::Call { function, args: Arguments(args) })
            }
            Some(tok) => Err(ParseError { position: at, message: format!("expected register or '(', got {tok:?}") }),
            None => Err(self.error("expected register or '(', got end of input")),
        }
    }
}

/// Parse the text of a call's argument list, e.g. `(Succ,x1),x2`.
pub fn parse_arguments(source: &str) -> Result<Vec<Argument>> {
    let tokens = lexer::lex(source)?;
    let mut parser = Parser::new(tokens, source.len());
    parser.parse_list()
}
