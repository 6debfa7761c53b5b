//! Tokenizer for the analysis dialect.
//!
//! Line-oriented with significant indentation: the lexer emits `Newline`,
//! `Indent` and `Dedent` tokens so the parser can treat blocks structurally.
//! Newlines inside brackets are ignored (implicit line joining), which is
//! how multi-line call expressions from generated code stay one statement.

use super::ast::SyntaxError;

#[derive(Debug, Clone, PartialEq)]
pub enum Tok {
    Name(String),
    Int(i64),
    Float(f64),
    Str(String),
    // keywords
    Import,
    From,
    As,
    For,
    In,
    If,
    Elif,
    Else,
    And,
    Or,
    Not,
    True,
    False,
    None,
    // punctuation and operators
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Colon,
    Dot,
    Assign,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Plus,
    Minus,
    Star,
    Slash,
    SlashSlash,
    Percent,
    Newline,
    Indent,
    Dedent,
    Eof,
}

impl Tok {
    pub fn describe(&self) -> String {
        match self {
            Tok::Name(n) => format!("name '{}'", n),
            Tok::Int(v) => format!("number {}", v),
            Tok::Float(v) => format!("number {}", v),
            Tok::Str(_) => "string literal".into(),
            Tok::Newline => "end of line".into(),
            Tok::Indent => "indent".into(),
            Tok::Dedent => "dedent".into(),
            Tok::Eof => "end of input".into(),
            other => format!("'{}'", symbol(other)),
        }
    }
}

fn symbol(t: &Tok) -> &'static str {
    match t {
        Tok::Import => "import",
        Tok::From => "from",
        Tok::As => "as",
        Tok::For => "for",
        Tok::In => "in",
        Tok::If => "if",
        Tok::Elif => "elif",
        Tok::Else => "else",
        Tok::And => "and",
        Tok::Or => "or",
        Tok::Not => "not",
        Tok::True => "True",
        Tok::False => "False",
        Tok::None => "None",
        Tok::LParen => "(",
        Tok::RParen => ")",
        Tok::LBracket => "[",
        Tok::RBracket => "]",
        Tok::Comma => ",",
        Tok::Colon => ":",
        Tok::Dot => ".",
        Tok::Assign => "=",
        Tok::Eq => "==",
        Tok::Ne => "!=",
        Tok::Lt => "<",
        Tok::Le => "<=",
        Tok::Gt => ">",
        Tok::Ge => ">=",
        Tok::Plus => "+",
        Tok::Minus => "-",
        Tok::Star => "*",
        Tok::Slash => "/",
        Tok::SlashSlash => "//",
        Tok::Percent => "%",
        _ => "?",
    }
}

#[derive(Debug, Clone)]
pub struct Token {
    pub tok: Tok,
    pub line: usize,
}

pub fn tokenize(src: &str) -> Result<Vec<Token>, SyntaxError> {
    Lexer::new(src).run()
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    depth: usize,
    indents: Vec<usize>,
    toks: Vec<Token>,
}

impl Lexer {
    fn new(src: &str) -> Self {
        Self {
            chars: src.chars().collect(),
            pos: 0,
            line: 1,
            depth: 0,
            indents: vec![0],
            toks: Vec::new(),
        }
    }

    fn err(&self, message: impl Into<String>) -> SyntaxError {
        SyntaxError {
            line: self.line,
            message: message.into(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    fn push(&mut self, tok: Tok) {
        self.toks.push(Token {
            tok,
            line: self.line,
        });
    }

    fn last_tok(&self) -> Option<&Tok> {
        self.toks.last().map(|t| &t.tok)
    }

    fn run(mut self) -> Result<Vec<Token>, SyntaxError> {
        self.handle_line_start()?;
        while let Some(c) = self.peek() {
            match c {
                ' ' | '\t' | '\r' => {
                    self.pos += 1;
                }
                '#' => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.pos += 1;
                    }
                }
                '\n' => {
                    self.pos += 1;
                    self.line += 1;
                    if self.depth == 0 {
                        if !matches!(
                            self.last_tok(),
                            Option::None | Some(Tok::Newline) | Some(Tok::Indent)
                        ) {
                            self.toks.push(Token {
                                tok: Tok::Newline,
                                line: self.line - 1,
                            });
                        }
                        self.handle_line_start()?;
                    }
                }
                '\'' | '"' => self.lex_string(c)?,
                c if c.is_ascii_digit() => self.lex_number()?,
                c if c.is_alphabetic() || c == '_' => self.lex_word(),
                _ => self.lex_operator()?,
            }
        }
        if !matches!(
            self.last_tok(),
            Option::None | Some(Tok::Newline) | Some(Tok::Indent)
        ) {
            self.push(Tok::Newline);
        }
        while self.indents.len() > 1 {
            self.indents.pop();
            self.push(Tok::Dedent);
        }
        self.push(Tok::Eof);
        Ok(self.toks)
    }

    /// Measure indentation at the start of a logical line and emit
    /// Indent/Dedent tokens. Blank and comment-only lines are skipped.
    fn handle_line_start(&mut self) -> Result<(), SyntaxError> {
        loop {
            let mut width = 0usize;
            let mut i = self.pos;
            while let Some(&c) = self.chars.get(i) {
                match c {
                    ' ' => width += 1,
                    '\t' => width += 4,
                    '\r' => {}
                    _ => break,
                }
                i += 1;
            }
            match self.chars.get(i) {
                // blank line: consume it and measure the next one
                Some('\n') => {
                    self.pos = i + 1;
                    self.line += 1;
                    continue;
                }
                Some('#') => {
                    let mut j = i;
                    while let Some(&c) = self.chars.get(j) {
                        if c == '\n' {
                            break;
                        }
                        j += 1;
                    }
                    if self.chars.get(j).is_some() {
                        self.pos = j + 1;
                        self.line += 1;
                        continue;
                    }
                    self.pos = j;
                    return Ok(());
                }
                Option::None => {
                    self.pos = i;
                    return Ok(());
                }
                Some(_) => {
                    self.pos = i;
                    let current = *self.indents.last().unwrap_or(&0);
                    if width > current {
                        self.indents.push(width);
                        self.push(Tok::Indent);
                    } else if width < current {
                        while *self.indents.last().unwrap_or(&0) > width {
                            self.indents.pop();
                            self.push(Tok::Dedent);
                        }
                        if *self.indents.last().unwrap_or(&0) != width {
                            return Err(self.err("inconsistent indentation"));
                        }
                    }
                    return Ok(());
                }
            }
        }
    }

    fn lex_string(&mut self, quote: char) -> Result<(), SyntaxError> {
        self.pos += 1;
        let mut out = String::new();
        loop {
            match self.bump() {
                Option::None | Some('\n') => {
                    return Err(self.err("unterminated string literal"));
                }
                Some('\\') => match self.bump() {
                    Some('n') => out.push('\n'),
                    Some('t') => out.push('\t'),
                    Some('r') => out.push('\r'),
                    Some('\\') => out.push('\\'),
                    Some('\'') => out.push('\''),
                    Some('"') => out.push('"'),
                    Some(other) => {
                        out.push('\\');
                        out.push(other);
                    }
                    Option::None => return Err(self.err("unterminated string literal")),
                },
                Some(c) if c == quote => break,
                Some(c) => out.push(c),
            }
        }
        self.push(Tok::Str(out));
        Ok(())
    }

    fn lex_number(&mut self) -> Result<(), SyntaxError> {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.pos += 1;
        }
        let mut is_float = false;
        if self.peek() == Some('.') && matches!(self.peek_at(1), Some(c) if c.is_ascii_digit()) {
            is_float = true;
            self.pos += 1;
            while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                self.pos += 1;
            }
        }
        if matches!(self.peek(), Some('e') | Some('E')) {
            let mut j = self.pos + 1;
            if matches!(self.chars.get(j), Some('+') | Some('-')) {
                j += 1;
            }
            if matches!(self.chars.get(j), Some(c) if c.is_ascii_digit()) {
                is_float = true;
                self.pos = j;
                while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                    self.pos += 1;
                }
            }
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        if is_float {
            let v: f64 = text
                .parse()
                .map_err(|_| self.err(format!("invalid number literal '{}'", text)))?;
            self.push(Tok::Float(v));
        } else {
            match text.parse::<i64>() {
                Ok(v) => self.push(Tok::Int(v)),
                // out of i64 range: keep the value as a float
                Err(_) => {
                    let v: f64 = text
                        .parse()
                        .map_err(|_| self.err(format!("invalid number literal '{}'", text)))?;
                    self.push(Tok::Float(v));
                }
            }
        }
        Ok(())
    }

    fn lex_word(&mut self) {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_alphanumeric() || c == '_') {
            self.pos += 1;
        }
        let word: String = self.chars[start..self.pos].iter().collect();
        let tok = match word.as_str() {
            "import" => Tok::Import,
            "from" => Tok::From,
            "as" => Tok::As,
            "for" => Tok::For,
            "in" => Tok::In,
            "if" => Tok::If,
            "elif" => Tok::Elif,
            "else" => Tok::Else,
            "and" => Tok::And,
            "or" => Tok::Or,
            "not" => Tok::Not,
            "True" => Tok::True,
            "False" => Tok::False,
            "None" => Tok::None,
            _ => Tok::Name(word),
        };
        self.push(tok);
    }

    fn lex_operator(&mut self) -> Result<(), SyntaxError> {
        let c = self.bump().unwrap_or('\0');
        let tok = match c {
            '(' => {
                self.depth += 1;
                Tok::LParen
            }
            ')' => {
                self.depth = self.depth.saturating_sub(1);
                Tok::RParen
            }
            '[' => {
                self.depth += 1;
                Tok::LBracket
            }
            ']' => {
                self.depth = self.depth.saturating_sub(1);
                Tok::RBracket
            }
            ',' => Tok::Comma,
            ':' => Tok::Colon,
            '.' => Tok::Dot,
            '+' => Tok::Plus,
            '-' => Tok::Minus,
            '*' => Tok::Star,
            '%' => Tok::Percent,
            '/' => {
                if self.peek() == Some('/') {
                    self.pos += 1;
                    Tok::SlashSlash
                } else {
                    Tok::Slash
                }
            }
            '=' => {
                if self.peek() == Some('=') {
                    self.pos += 1;
                    Tok::Eq
                } else {
                    Tok::Assign
                }
            }
            '!' => {
                if self.peek() == Some('=') {
                    self.pos += 1;
                    Tok::Ne
                } else {
                    return Err(self.err("unexpected character '!'"));
                }
            }
            '<' => {
                if self.peek() == Some('=') {
                    self.pos += 1;
                    Tok::Le
                } else {
                    Tok::Lt
                }
            }
            '>' => {
                if self.peek() == Some('=') {
                    self.pos += 1;
                    Tok::Ge
                } else {
                    Tok::Gt
                }
            }
            other => return Err(self.err(format!("unexpected character '{}'", other))),
        };
        self.push(tok);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<Tok> {
        tokenize(src).unwrap().into_iter().map(|t| t.tok).collect()
    }

    #[test]
    fn lexes_calls_and_strings() {
        let toks = kinds("print('hi', 2)\n");
        assert_eq!(
            toks,
            vec![
                Tok::Name("print".into()),
                Tok::LParen,
                Tok::Str("hi".into()),
                Tok::Comma,
                Tok::Int(2),
                Tok::RParen,
                Tok::Newline,
                Tok::Eof,
            ]
        );
    }

    #[test]
    fn indentation_produces_block_tokens() {
        let toks = kinds("if x:\n    y = 1\nz = 2");
        assert!(toks.contains(&Tok::Indent));
        assert!(toks.contains(&Tok::Dedent));
        let newlines = toks.iter().filter(|t| **t == Tok::Newline).count();
        assert_eq!(newlines, 3);
    }

    #[test]
    fn newlines_inside_brackets_are_joined() {
        let toks = kinds("f(1,\n   2)\n");
        let newlines = toks.iter().filter(|t| **t == Tok::Newline).count();
        assert_eq!(newlines, 1);
        assert!(!toks.contains(&Tok::Indent));
    }

    #[test]
    fn blank_and_comment_lines_are_skipped() {
        let toks = kinds("a = 1\n\n# note\n    \nb = 2\n");
        assert!(!toks.contains(&Tok::Indent));
        let newlines = toks.iter().filter(|t| **t == Tok::Newline).count();
        assert_eq!(newlines, 2);
    }

    #[test]
    fn floats_and_ints_are_distinguished() {
        assert_eq!(
            kinds("1.5 2 3e2\n")[..3],
            [Tok::Float(1.5), Tok::Int(2), Tok::Float(300.0)]
        );
    }

    #[test]
    fn unterminated_string_reports_line() {
        let err = tokenize("x = 1\ny = 'oops\n").unwrap_err();
        assert_eq!(err.line, 2);
        assert!(err.message.contains("unterminated"));
    }

    #[test]
    fn inconsistent_dedent_is_an_error() {
        let err = tokenize("if x:\n        a = 1\n   b = 2\n").unwrap_err();
        assert!(err.message.contains("indentation"));
    }
}
