use super::SyntaxError;

/// Byte range `[start, end)` into the source document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Slice the spanned text out of `source`, if the range is valid for it.
    pub fn text<'s>(&self, source: &'s str) -> Option<&'s str> {
        source.get(self.start..self.end)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrKind {
    Plain,
    Bytes,
    Format,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Identifiers and keywords, distinguished in the parser
    Name(String),
    /// String literal. `value` has escapes resolved, except for raw strings
    /// and f-strings where it is the body as written.
    Str {
        value: String,
        kind: StrKind,
        raw: bool,
    },
    /// Integer literal, kept as written (may carry a radix prefix or `_`)
    Int(String),
    /// Float literal, kept as written
    Float(String),
    /// Imaginary literal such as `2j`
    Imag(String),
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Colon,
    Comma,
    Semi,
    Dot,
    Ellipsis,
    Arrow,
    Assign,
    Walrus,
    /// Augmented assignment operator without the trailing `=`, e.g. `+`
    AugAssign(String),
    /// Arithmetic, bitwise and comparison operators
    Op(String),
    Newline,
    Indent,
    Dedent,
    Eof,
}

#[derive(Debug, Clone)]
pub struct Spanned {
    pub token: Token,
    pub span: Span,
    pub line: u32,
}

const THREE_CHAR_OPS: &[&str] = &["**=", "//=", ">>=", "<<=", "..."];
const TWO_CHAR_OPS: &[&str] = &[
    "**", "//", ">>", "<<", "<=", ">=", "==", "!=", "->", ":=", "+=", "-=", "*=", "/=", "%=", "&=",
    "|=", "^=", "@=",
];
/// Deepest bracket nesting accepted, as in CPython's tokenizer.
pub const MAX_BRACKET_DEPTH: usize = 200;
const MAX_INDENT_LEVELS: usize = 100;

const STRING_PREFIXES: &[&str] = &["r", "u", "b", "f", "br", "rb", "fr", "rf"];

pub fn lex(src: &str) -> Result<Vec<Spanned>, SyntaxError> {
    Lexer::new(src).run()
}

struct Lexer<'a> {
    src: &'a str,
    chars: Vec<(usize, char)>,
    pos: usize,
    line: u32,
    tokens: Vec<Spanned>,
    indents: Vec<usize>,
    brackets: Vec<(char, u32)>,
    at_line_start: bool,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            chars: src.char_indices().collect(),
            pos: 0,
            line: 1,
            tokens: Vec::new(),
            indents: vec![0],
            brackets: Vec::new(),
            at_line_start: true,
        }
    }

    fn offset(&self, pos: usize) -> usize {
        self.chars.get(pos).map(|&(o, _)| o).unwrap_or(self.src.len())
    }

    fn char_at(&self, pos: usize) -> Option<char> {
        self.chars.get(pos).map(|&(_, c)| c)
    }

    fn starts_with(&self, s: &str) -> bool {
        self.src[self.offset(self.pos)..].starts_with(s)
    }

    fn push(&mut self, token: Token, start_pos: usize, line: u32) {
        let span = Span::new(self.offset(start_pos), self.offset(self.pos));
        self.tokens.push(Spanned { token, span, line });
    }

    fn run(mut self) -> Result<Vec<Spanned>, SyntaxError> {
        loop {
            if self.at_line_start && self.brackets.is_empty() && !self.handle_line_start()? {
                continue;
            }

            let Some(c) = self.char_at(self.pos) else {
                break;
            };

            match c {
                '\n' => {
                    if self.brackets.is_empty() {
                        let start = self.pos;
                        self.pos += 1;
                        self.push(Token::Newline, start, self.line);
                        self.at_line_start = true;
                    } else {
                        self.pos += 1;
                    }
                    self.line += 1;
                }
                ' ' | '\t' | '\r' | '\x0c' => self.pos += 1,
                '#' => self.skip_comment(),
                '\\' => self.line_continuation()?,
                '"' | '\'' => self.lex_string(self.pos, "")?,
                c if c.is_ascii_digit() => self.lex_number()?,
                '.' if self.char_at(self.pos + 1).is_some_and(|n| n.is_ascii_digit()) => {
                    self.lex_number()?
                }
                c if c.is_alphabetic() || c == '_' => self.lex_name()?,
                _ => self.lex_punct(c)?,
            }
        }

        if let Some(&(open, line)) = self.brackets.last() {
            return Err(SyntaxError::new(line, format!("'{}' was never closed", open)));
        }

        let end = self.chars.len();
        if !matches!(self.tokens.last().map(|t| &t.token), None | Some(Token::Newline)) {
            self.pos = end;
            self.push(Token::Newline, end, self.line);
        }
        while self.indents.len() > 1 {
            self.indents.pop();
            self.push(Token::Dedent, end, self.line);
        }
        self.push(Token::Eof, end, self.line);
        Ok(self.tokens)
    }

    /// Measure indentation at the start of a logical line. Returns `false`
    /// when the line was blank or comment-only and the caller should loop.
    fn handle_line_start(&mut self) -> Result<bool, SyntaxError> {
        let mut width = 0usize;
        while let Some(c) = self.char_at(self.pos) {
            match c {
                ' ' => width += 1,
                '\t' => width = (width / 8 + 1) * 8,
                '\x0c' => width = 0,
                _ => break,
            }
            self.pos += 1;
        }

        match self.char_at(self.pos) {
            None => {
                self.at_line_start = false;
                Ok(true)
            }
            Some('\n') => {
                self.pos += 1;
                self.line += 1;
                Ok(false)
            }
            Some('\r') => {
                self.pos += 1;
                Ok(false)
            }
            Some('#') => {
                self.skip_comment();
                Ok(false)
            }
            Some(_) => {
                self.apply_indent(width)?;
                self.at_line_start = false;
                Ok(true)
            }
        }
    }

    fn apply_indent(&mut self, width: usize) -> Result<(), SyntaxError> {
        let current = self.indents.last().copied().unwrap_or(0);
        if width > current {
            if self.indents.len() > MAX_INDENT_LEVELS {
                return Err(SyntaxError::new(self.line, "too many levels of indentation"));
            }
            self.indents.push(width);
            self.push(Token::Indent, self.pos, self.line);
        } else if width < current {
            while self.indents.last().is_some_and(|&w| w > width) {
                self.indents.pop();
                self.push(Token::Dedent, self.pos, self.line);
            }
            if self.indents.last().copied().unwrap_or(0) != width {
                return Err(SyntaxError::new(
                    self.line,
                    "unindent does not match any outer indentation level",
                ));
            }
        }
        Ok(())
    }

    fn skip_comment(&mut self) {
        while self.char_at(self.pos).is_some_and(|c| c != '\n') {
            self.pos += 1;
        }
    }

    fn line_continuation(&mut self) -> Result<(), SyntaxError> {
        match (self.char_at(self.pos + 1), self.char_at(self.pos + 2)) {
            (Some('\n'), _) => {
                self.pos += 2;
                self.line += 1;
                Ok(())
            }
            (Some('\r'), Some('\n')) => {
                self.pos += 3;
                self.line += 1;
                Ok(())
            }
            _ => Err(SyntaxError::new(
                self.line,
                "unexpected character after line continuation character",
            )),
        }
    }

    fn lex_name(&mut self) -> Result<(), SyntaxError> {
        let start = self.pos;
        while self
            .char_at(self.pos)
            .is_some_and(|c| c.is_alphanumeric() || c == '_')
        {
            self.pos += 1;
        }
        let word = &self.src[self.offset(start)..self.offset(self.pos)];

        if matches!(self.char_at(self.pos), Some('"') | Some('\''))
            && STRING_PREFIXES.contains(&word.to_ascii_lowercase().as_str())
        {
            let prefix = word.to_ascii_lowercase();
            return self.lex_string(start, &prefix);
        }

        let word = word.to_string();
        self.push(Token::Name(word), start, self.line);
        Ok(())
    }

    fn lex_string(&mut self, start: usize, prefix: &str) -> Result<(), SyntaxError> {
        let tok_line = self.line;
        let quote = self.char_at(self.pos).unwrap_or('"');
        let triple = self.char_at(self.pos + 1) == Some(quote) && self.char_at(self.pos + 2) == Some(quote);
        self.pos += if triple { 3 } else { 1 };

        let body_start = self.offset(self.pos);
        let body_end;
        loop {
            let Some(c) = self.char_at(self.pos) else {
                let message = if triple {
                    "unterminated triple-quoted string literal"
                } else {
                    "unterminated string literal"
                };
                return Err(SyntaxError::new(tok_line, message));
            };
            match c {
                '\\' => {
                    if self.char_at(self.pos + 1) == Some('\n') {
                        self.line += 1;
                    }
                    self.pos += 2;
                }
                '\n' if !triple => {
                    return Err(SyntaxError::new(tok_line, "unterminated string literal"));
                }
                '\n' => {
                    self.line += 1;
                    self.pos += 1;
                }
                c if c == quote => {
                    if !triple {
                        body_end = self.offset(self.pos);
                        self.pos += 1;
                        break;
                    }
                    if self.char_at(self.pos + 1) == Some(quote)
                        && self.char_at(self.pos + 2) == Some(quote)
                    {
                        body_end = self.offset(self.pos);
                        self.pos += 3;
                        break;
                    }
                    self.pos += 1;
                }
                _ => self.pos += 1,
            }
        }

        let body = &self.src[body_start..body_end.min(self.src.len())];
        let raw = prefix.contains('r');
        let kind = if prefix.contains('f') {
            StrKind::Format
        } else if prefix.contains('b') {
            StrKind::Bytes
        } else {
            StrKind::Plain
        };
        let value = if raw || kind == StrKind::Format {
            body.to_string()
        } else {
            unescape(body, kind == StrKind::Bytes).map_err(|m| SyntaxError::new(tok_line, m))?
        };

        self.push(
            Token::Str { value, kind, raw },
            start,
            tok_line,
        );
        Ok(())
    }

    fn lex_number(&mut self) -> Result<(), SyntaxError> {
        let start = self.pos;
        let digits = |c: char| c.is_ascii_digit() || c == '_';

        if self.char_at(self.pos) == Some('0')
            && matches!(
                self.char_at(self.pos + 1),
                Some('x' | 'X' | 'o' | 'O' | 'b' | 'B')
            )
        {
            self.pos += 2;
            while self
                .char_at(self.pos)
                .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_')
            {
                self.pos += 1;
            }
            let text = self.src[self.offset(start)..self.offset(self.pos)].to_string();
            self.push(Token::Int(text), start, self.line);
            return Ok(());
        }

        let mut is_float = false;
        while self.char_at(self.pos).is_some_and(digits) {
            self.pos += 1;
        }
        if self.char_at(self.pos) == Some('.') {
            is_float = true;
            self.pos += 1;
            while self.char_at(self.pos).is_some_and(digits) {
                self.pos += 1;
            }
        }
        if matches!(self.char_at(self.pos), Some('e' | 'E')) {
            let sign = matches!(self.char_at(self.pos + 1), Some('+' | '-'));
            let exp_digit = self.char_at(self.pos + if sign { 2 } else { 1 });
            if exp_digit.is_some_and(|c| c.is_ascii_digit()) {
                is_float = true;
                self.pos += if sign { 2 } else { 1 };
                while self.char_at(self.pos).is_some_and(digits) {
                    self.pos += 1;
                }
            }
        }

        let imaginary = matches!(self.char_at(self.pos), Some('j' | 'J'));
        if imaginary {
            self.pos += 1;
        }
        if self
            .char_at(self.pos)
            .is_some_and(|c| c.is_alphanumeric() || c == '_')
        {
            return Err(SyntaxError::new(self.line, "invalid decimal literal"));
        }

        let text = self.src[self.offset(start)..self.offset(self.pos)].to_string();
        let token = if imaginary {
            Token::Imag(text)
        } else if is_float {
            Token::Float(text)
        } else {
            Token::Int(text)
        };
        self.push(token, start, self.line);
        Ok(())
    }

    fn lex_punct(&mut self, c: char) -> Result<(), SyntaxError> {
        let start = self.pos;
        let line = self.line;

        for op in THREE_CHAR_OPS {
            if self.starts_with(op) {
                self.pos += 3;
                let token = if *op == "..." {
                    Token::Ellipsis
                } else {
                    Token::AugAssign(op[..2].to_string())
                };
                self.push(token, start, line);
                return Ok(());
            }
        }

        for op in TWO_CHAR_OPS {
            if self.starts_with(op) {
                self.pos += 2;
                let token = match *op {
                    "->" => Token::Arrow,
                    ":=" => Token::Walrus,
                    "<=" | ">=" | "==" | "!=" | "**" | "//" | ">>" | "<<" => {
                        Token::Op(op.to_string())
                    }
                    other => Token::AugAssign(other[..1].to_string()),
                };
                self.push(token, start, line);
                return Ok(());
            }
        }

        let token = match c {
            '(' | '[' | '{' => {
                if self.brackets.len() >= MAX_BRACKET_DEPTH {
                    return Err(SyntaxError::new(line, "too many nested parentheses"));
                }
                self.brackets.push((c, line));
                match c {
                    '(' => Token::LParen,
                    '[' => Token::LBracket,
                    _ => Token::LBrace,
                }
            }
            ')' | ']' | '}' => {
                let expected = match c {
                    ')' => '(',
                    ']' => '[',
                    _ => '{',
                };
                match self.brackets.pop() {
                    None => return Err(SyntaxError::new(line, format!("unmatched '{}'", c))),
                    Some((open, _)) if open != expected => {
                        return Err(SyntaxError::new(
                            line,
                            format!(
                                "closing parenthesis '{}' does not match opening parenthesis '{}'",
                                c, open
                            ),
                        ))
                    }
                    Some(_) => {}
                }
                match c {
                    ')' => Token::RParen,
                    ']' => Token::RBracket,
                    _ => Token::RBrace,
                }
            }
            ':' => Token::Colon,
            ',' => Token::Comma,
            ';' => Token::Semi,
            '.' => Token::Dot,
            '=' => Token::Assign,
            '+' | '-' | '*' | '/' | '%' | '&' | '|' | '^' | '~' | '<' | '>' | '@' => {
                Token::Op(c.to_string())
            }
            _ => return Err(SyntaxError::new(line, format!("invalid character '{}'", c))),
        };
        self.pos += 1;
        self.push(token, start, line);
        Ok(())
    }
}

/// Resolve backslash escapes in a non-raw string body.
pub fn unescape(body: &str, bytes: bool) -> Result<String, String> {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let Some(esc) = chars.next() else {
            out.push('\\');
            break;
        };
        match esc {
            '\n' => {}
            '\\' => out.push('\\'),
            '\'' => out.push('\''),
            '"' => out.push('"'),
            'a' => out.push('\x07'),
            'b' => out.push('\x08'),
            'f' => out.push('\x0c'),
            'n' => out.push('\n'),
            'r' => out.push('\r'),
            't' => out.push('\t'),
            'v' => out.push('\x0b'),
            '0'..='7' => {
                let mut value = esc.to_digit(8).unwrap_or(0);
                for _ in 0..2 {
                    match chars.peek().and_then(|d| d.to_digit(8)) {
                        Some(d) => {
                            value = value * 8 + d;
                            chars.next();
                        }
                        None => break,
                    }
                }
                out.push(char::from_u32(value).unwrap_or('\u{fffd}'));
            }
            'x' => out.push(hex_escape(&mut chars, 2, "\\xXX")?),
            'u' if !bytes => out.push(hex_escape(&mut chars, 4, "\\uXXXX")?),
            'U' if !bytes => out.push(hex_escape(&mut chars, 8, "\\UXXXXXXXX")?),
            other => {
                out.push('\\');
                out.push(other);
            }
        }
    }
    Ok(out)
}

fn hex_escape(
    chars: &mut std::iter::Peekable<std::str::Chars<'_>>,
    len: usize,
    form: &str,
) -> Result<char, String> {
    let mut value = 0u32;
    for _ in 0..len {
        match chars.peek().and_then(|d| d.to_digit(16)) {
            Some(d) => {
                value = value * 16 + d;
                chars.next();
            }
            None => return Err(format!("truncated {} escape", form)),
        }
    }
    char::from_u32(value).ok_or_else(|| format!("illegal Unicode character in {} escape", form))
}
