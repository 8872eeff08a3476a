use std::iter::Peekable;
use std::str::Chars;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Ident(String),
    /// Quoted with `'`, `"` or `` ` ``; the quotes are stripped.
    Str(String),
    /// Kept as written so integers and decimals survive unchanged.
    Num(String),

    LBrace,   // {
    RBrace,   // }
    LParen,   // (
    RParen,   // )
    LBracket, // [
    RBracket, // ]
    Comma,    // ,
    Colon,    // :
    Dot,      // .
    Lt,       // <
    Gt,       // >
    Dash,     // -

    Eof,
}

impl Token {
    /// Identifier or quoted name.
    pub fn as_name(&self) -> Option<&str> {
        match self {
            Token::Ident(s) | Token::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_keyword(&self, keyword: &str) -> bool {
        matches!(self, Token::Ident(s) if s.eq_ignore_ascii_case(keyword))
    }

    fn is_word(&self) -> bool {
        matches!(self, Token::Ident(_) | Token::Str(_) | Token::Num(_))
    }

    fn text(&self) -> String {
        match self {
            Token::Ident(s) | Token::Num(s) => s.clone(),
            Token::Str(s) => format!("'{}'", s),
            Token::LBrace => "{".into(),
            Token::RBrace => "}".into(),
            Token::LParen => "(".into(),
            Token::RParen => ")".into(),
            Token::LBracket => "[".into(),
            Token::RBracket => "]".into(),
            Token::Comma => ",".into(),
            Token::Colon => ":".into(),
            Token::Dot => ".".into(),
            Token::Lt => "<".into(),
            Token::Gt => ">".into(),
            Token::Dash => "-".into(),
            Token::Eof => String::new(),
        }
    }
}

/// Re-assemble tokens into source-like text, e.g. `now()` or `decimal(10,2)`.
pub fn render(tokens: &[Token]) -> String {
    let mut out = String::new();
    let mut prev_word = false;
    for tok in tokens {
        if tok.is_word() && prev_word {
            out.push(' ');
        }
        out.push_str(&tok.text());
        prev_word = tok.is_word();
    }
    out
}

#[derive(Debug, thiserror::Error)]
pub enum LexError {
    #[error("Unexpected character: {0}")]
    UnexpectedChar(char),
    #[error("Unterminated string")]
    UnterminatedString,
}

/// Tokenizer for a single DBML line. `//` starts a comment running to the end of input.
pub struct Lexer<'a> {
    chars: Peekable<Chars<'a>>,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            chars: input.chars().peekable(),
        }
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            match self.chars.peek().copied() {
                Some(c) if c.is_whitespace() => {
                    self.chars.next();
                }
                Some('/') if self.peek_second() == Some('/') => {
                    for _ in self.chars.by_ref() {}
                }
                _ => break,
            }
        }
    }

    fn peek_second(&self) -> Option<char> {
        let mut ahead = self.chars.clone();
        ahead.next();
        ahead.next()
    }

    fn read_word(&mut self, first: char) -> Token {
        let mut s = String::from(first);
        while let Some(&c) = self.chars.peek() {
            if c.is_alphanumeric() || c == '_' {
                s.push(c);
                self.chars.next();
            } else {
                break;
            }
        }

        if !s.chars().all(|c| c.is_ascii_digit()) {
            return Token::Ident(s);
        }

        // Decimal part
        if self.chars.peek() == Some(&'.') && self.peek_second().is_some_and(|c| c.is_ascii_digit()) {
            s.push('.');
            self.chars.next();
            while let Some(&c) = self.chars.peek() {
                if c.is_ascii_digit() {
                    s.push(c);
                    self.chars.next();
                } else {
                    break;
                }
            }
        }
        Token::Num(s)
    }

    fn read_string(&mut self, quote: char) -> Result<String, LexError> {
        let mut s = String::new();
        loop {
            match self.chars.next() {
                Some(c) if c == quote => return Ok(s),
                Some('\\') => {
                    if let Some(c) = self.chars.next() {
                        match c {
                            'n' => s.push('\n'),
                            't' => s.push('\t'),
                            'r' => s.push('\r'),
                            _ => s.push(c),
                        }
                    }
                }
                Some(c) => s.push(c),
                None => return Err(LexError::UnterminatedString),
            }
        }
    }

    pub fn next_token(&mut self) -> Result<Token, LexError> {
        self.skip_whitespace_and_comments();

        let c = match self.chars.next() {
            Some(c) => c,
            None => return Ok(Token::Eof),
        };

        let tok = match c {
            '{' => Token::LBrace,
            '}' => Token::RBrace,
            '(' => Token::LParen,
            ')' => Token::RParen,
            '[' => Token::LBracket,
            ']' => Token::RBracket,
            ',' => Token::Comma,
            ':' => Token::Colon,
            '.' => Token::Dot,
            '<' => Token::Lt,
            '>' => Token::Gt,
            '-' => Token::Dash,
            '\'' | '"' | '`' => Token::Str(self.read_string(c)?),
            c if c.is_alphanumeric() || c == '_' => self.read_word(c),
            _ => return Err(LexError::UnexpectedChar(c)),
        };

        Ok(tok)
    }

    pub fn tokenize(self) -> Result<Vec<Token>, LexError> {
        match self.tokenize_partial() {
            (tokens, None) => Ok(tokens),
            (_, Some(err)) => Err(err),
        }
    }

    /// Tokens up to the first error, always terminated by `Eof`, plus that error.
    pub fn tokenize_partial(mut self) -> (Vec<Token>, Option<LexError>) {
        let mut tokens = Vec::new();
        loop {
            match self.next_token() {
                Ok(Token::Eof) => {
                    tokens.push(Token::Eof);
                    return (tokens, None);
                }
                Ok(tok) => tokens.push(tok),
                Err(err) => {
                    tokens.push(Token::Eof);
                    return (tokens, Some(err));
                }
            }
        }
    }
}
