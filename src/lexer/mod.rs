use logos::Logos;

/// Tokens of a call-argument expression such as `(Minus,x1,(Const7)),x2`.
#[derive(Logos, Debug, PartialEq, Clone)]
#[logos(skip r"[ \t\r\n]+")]
pub enum Token {
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token(",")]
    Comma,

    // Registers and function names share a shape; the parser tells them apart
    // by position (a name always follows `(`).
    #[regex(r"[A-Za-z_][A-Za-z0-9_\-]*", |lex| lex.slice().to_string())]
    Ident(String),
}

/// Lex an argument expression into tokens with byte ranges.
pub fn lex(source: &str) -> Result<Vec<(Token, std::ops::Range<usize>)>, LexError> {
    let mut lexer = Token::lexer(source);
    let mut tokens = Vec::new();

    while let Some(result) = lexer.next() {
        match result {
            Ok(token) => tokens.push((token, lexer.span())),
            Err(()) => {
                let span = lexer.span();
                return Err(LexError {
                    position: span.start,
                    snippet: source[span.clone()].to_string(),
                    suggestion: suggest_fix(&source[span]),
                });
            }
        }
    }

    Ok(tokens)
}

fn suggest_fix(bad: &str) -> String {
    if bad.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        "Constants are not arguments; wrap them in a function such as (Const7)".to_string()
    } else {
        format!("Unexpected character(s): '{bad}'. Arguments are registers or (Name,args...) calls.")
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("Lex error at position {position}: '{snippet}'. {suggestion}")]
pub struct LexError {
    pub position: usize,
    pub snippet: String,
    pub suggestion: String,
}
