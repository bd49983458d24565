/// Recursive-descent parser over lexer tokens.
/// Produces the statement tree in [`ast`](super::ast); nothing is evaluated
/// here, resolution of values is the extraction layer's job.
use super::ast::{
    Comprehension, Constant, DictItem, Expr, ExprKind, FStringPart, Keyword, Stmt, UnaryOp,
};
use super::lexer::{self, unescape, Span, Spanned, StrKind, Token};
use super::SyntaxError;

const RESERVED: &[&str] = &[
    "and", "as", "assert", "async", "await", "break", "class", "continue", "def", "del", "elif",
    "else", "except", "finally", "for", "from", "global", "if", "import", "in", "is", "lambda",
    "nonlocal", "not", "or", "pass", "raise", "return", "try", "while", "with", "yield",
];

const COMPOUND_KEYWORDS: &[&str] = &["if", "while", "for", "try", "with", "def", "class"];

/// Recursion limit for nested expressions. Bracket nesting is capped
/// earlier by the lexer.
const MAX_DEPTH: usize = 400;

/// Binary operator precedence levels, loosest first. Comparisons and boolean
/// operators sit above these and are handled separately.
const BINARY_LEVELS: &[&[&str]] = &[
    &["|"],
    &["^"],
    &["&"],
    &["<<", ">>"],
    &["+", "-"],
    &["*", "/", "//", "%", "@"],
];

/// Parse a whole document into its top-level statements.
pub fn parse_module(source: &str) -> Result<Vec<Stmt>, SyntaxError> {
    let tokens = lexer::lex(source)?;
    Parser::new(&tokens).parse_module()
}

/// Parse a single standalone expression. Spans in the result are relative
/// to `source` with surrounding whitespace trimmed.
pub fn parse_expression(source: &str) -> Result<Expr, SyntaxError> {
    let tokens = lexer::lex(source.trim())?;
    let mut parser = Parser::new(&tokens);
    let expr = parser.parse_testlist_star_expr()?;
    while parser.eat(&Token::Newline) {}
    if parser.peek() != &Token::Eof {
        return Err(parser.unexpected());
    }
    Ok(expr)
}

struct Parser<'a> {
    tokens: &'a [Spanned],
    pos: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn new(tokens: &'a [Spanned]) -> Self {
        Parser {
            tokens,
            pos: 0,
            depth: 0,
        }
    }

    fn cur(&self) -> &'a Spanned {
        let tokens = self.tokens;
        &tokens[self.pos.min(tokens.len() - 1)]
    }

    fn peek(&self) -> &'a Token {
        &self.cur().token
    }

    fn peek_at(&self, n: usize) -> &'a Token {
        let tokens = self.tokens;
        &tokens[(self.pos + n).min(tokens.len() - 1)].token
    }

    fn advance(&mut self) -> &'a Spanned {
        let t = self.cur();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        t
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == token {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: Token, what: &str) -> Result<(), SyntaxError> {
        if self.eat(&token) {
            Ok(())
        } else {
            Err(self.err(format!("expected {}, got {}", what, describe(self.peek()))))
        }
    }

    fn expect_word(&mut self, word: &str) -> Result<(), SyntaxError> {
        if self.is_word(word) {
            self.advance();
            Ok(())
        } else {
            Err(self.err(format!(
                "expected '{}', got {}",
                word,
                describe(self.peek())
            )))
        }
    }

    fn is_word(&self, word: &str) -> bool {
        matches!(self.peek(), Token::Name(w) if w == word)
    }

    fn is_op(&self, op: &str) -> bool {
        matches!(self.peek(), Token::Op(o) if o == op)
    }

    fn is_comp_for(&self) -> bool {
        self.is_word("for")
            || (self.is_word("async") && matches!(self.peek_at(1), Token::Name(w) if w == "for"))
    }

    fn at_stmt_end(&self) -> bool {
        matches!(self.peek(), Token::Newline | Token::Semi | Token::Eof)
    }

    fn at_expr_end(&self) -> bool {
        matches!(
            self.peek(),
            Token::Assign
                | Token::AugAssign(_)
                | Token::Colon
                | Token::Newline
                | Token::Semi
                | Token::Eof
                | Token::RParen
                | Token::RBracket
                | Token::RBrace
        ) || self.is_word("in")
    }

    fn start(&self) -> usize {
        self.cur().span.start
    }

    fn span_from(&self, start: usize) -> Span {
        let end = if self.pos == 0 {
            start
        } else {
            self.tokens[self.pos - 1].span.end
        };
        Span::new(start, end.max(start))
    }

    fn err(&self, msg: impl Into<String>) -> SyntaxError {
        SyntaxError::new(self.cur().line, msg)
    }

    fn unexpected(&self) -> SyntaxError {
        self.err(format!("invalid syntax: unexpected {}", describe(self.peek())))
    }

    fn nested<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, SyntaxError>,
    ) -> Result<T, SyntaxError> {
        if self.depth >= MAX_DEPTH {
            return Err(self.err("too many nested expressions"));
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    // -- Statements ----------------------------------------------

    fn parse_module(&mut self) -> Result<Vec<Stmt>, SyntaxError> {
        let mut body = Vec::new();
        loop {
            match self.peek() {
                Token::Eof => break,
                Token::Newline => {
                    self.advance();
                }
                Token::Indent => return Err(self.err("unexpected indent")),
                _ => self.parse_statement(&mut body)?,
            }
        }
        Ok(body)
    }

    fn parse_statement(&mut self, out: &mut Vec<Stmt>) -> Result<(), SyntaxError> {
        if self.is_op("@") {
            self.advance();
            self.parse_named_expr()?;
            self.expect(Token::Newline, "end of line after decorator")?;
            out.push(Stmt::Simple {
                keyword: "@".to_string(),
            });
            return Ok(());
        }

        if let Token::Name(word) = self.peek() {
            if word == "async"
                && matches!(self.peek_at(1), Token::Name(w) if matches!(w.as_str(), "def" | "for" | "with"))
            {
                self.advance();
                return self.parse_compound(out);
            }
            if COMPOUND_KEYWORDS.contains(&word.as_str()) {
                return self.parse_compound(out);
            }
            if word == "match" && self.parse_match(out)? {
                return Ok(());
            }
        }

        self.parse_simple_statements(out)
    }

    /// A compound statement with its continuation clauses. Each clause is
    /// emitted as its own [`Stmt::Compound`] in source order.
    fn parse_compound(&mut self, out: &mut Vec<Stmt>) -> Result<(), SyntaxError> {
        let keyword = match self.peek() {
            Token::Name(w) => w.clone(),
            _ => return Err(self.unexpected()),
        };
        self.advance();

        match keyword.as_str() {
            "if" => {
                self.parse_named_expr()?;
                self.parse_clause_body("if", out)?;
                while self.is_word("elif") {
                    self.advance();
                    self.parse_named_expr()?;
                    self.parse_clause_body("elif", out)?;
                }
                self.parse_else_clause(out)
            }
            "while" => {
                self.parse_named_expr()?;
                self.parse_clause_body("while", out)?;
                self.parse_else_clause(out)
            }
            "for" => {
                self.parse_target_list()?;
                self.expect_word("in")?;
                self.parse_testlist_star_expr()?;
                self.parse_clause_body("for", out)?;
                self.parse_else_clause(out)
            }
            "try" => {
                self.parse_clause_body("try", out)?;
                let mut handlers = 0usize;
                while self.is_word("except") {
                    self.advance();
                    self.skip_to_colon()?;
                    self.parse_clause_body("except", out)?;
                    handlers += 1;
                }
                if handlers > 0 {
                    self.parse_else_clause(out)?;
                }
                if self.is_word("finally") {
                    self.advance();
                    self.parse_clause_body("finally", out)?;
                } else if handlers == 0 {
                    return Err(self.err("expected 'except' or 'finally' block"));
                }
                Ok(())
            }
            _ => {
                self.skip_to_colon()?;
                self.parse_clause_body(&keyword, out)
            }
        }
    }

    fn parse_clause_body(&mut self, keyword: &str, out: &mut Vec<Stmt>) -> Result<(), SyntaxError> {
        self.expect(Token::Colon, "':'")?;
        let body = self.parse_suite()?;
        out.push(Stmt::Compound {
            keyword: keyword.to_string(),
            body,
        });
        Ok(())
    }

    fn parse_else_clause(&mut self, out: &mut Vec<Stmt>) -> Result<(), SyntaxError> {
        if !self.is_word("else") {
            return Ok(());
        }
        self.advance();
        self.parse_clause_body("else", out)
    }

    /// `match` is a soft keyword: the statement form is only taken when the
    /// header is followed by an indented block of `case` clauses, otherwise
    /// the position is restored and `match` is parsed as a name.
    fn parse_match(&mut self, out: &mut Vec<Stmt>) -> Result<bool, SyntaxError> {
        let saved = self.pos;
        self.advance();
        let header = self.parse_testlist_star_expr().is_ok()
            && self.eat(&Token::Colon)
            && self.eat(&Token::Newline)
            && self.eat(&Token::Indent)
            && self.is_word("case");
        if !header {
            self.pos = saved;
            return Ok(false);
        }

        let mut cases = Vec::new();
        loop {
            match self.peek() {
                Token::Dedent => {
                    self.advance();
                    break;
                }
                Token::Eof => break,
                Token::Newline => {
                    self.advance();
                }
                Token::Name(w) if w == "case" => {
                    self.advance();
                    if self.peek() == &Token::Colon {
                        return Err(self.err("expected a case pattern"));
                    }
                    self.skip_to_colon()?;
                    self.parse_clause_body("case", &mut cases)?;
                }
                _ => return Err(self.unexpected()),
            }
        }
        out.push(Stmt::Compound {
            keyword: "match".to_string(),
            body: cases,
        });
        Ok(true)
    }

    /// Skip a `def`/`class`/`with`/`except` header, a case pattern or
    /// lambda parameters up to the `:` that ends it.
    fn skip_to_colon(&mut self) -> Result<(), SyntaxError> {
        let mut depth = 0usize;
        loop {
            match self.peek() {
                Token::LParen | Token::LBracket | Token::LBrace => depth += 1,
                Token::RParen | Token::RBracket | Token::RBrace => {
                    depth = depth.saturating_sub(1)
                }
                Token::Colon if depth == 0 => return Ok(()),
                Token::Newline | Token::Eof | Token::Indent | Token::Dedent => {
                    return Err(self.err("expected ':'"))
                }
                _ => {}
            }
            self.advance();
        }
    }

    fn parse_suite(&mut self) -> Result<Vec<Stmt>, SyntaxError> {
        let mut body = Vec::new();
        if !self.eat(&Token::Newline) {
            self.parse_simple_statements(&mut body)?;
            return Ok(body);
        }
        if !self.eat(&Token::Indent) {
            return Err(self.err("expected an indented block"));
        }
        loop {
            match self.peek() {
                Token::Dedent => {
                    self.advance();
                    break;
                }
                Token::Eof => break,
                Token::Newline => {
                    self.advance();
                }
                Token::Indent => return Err(self.err("unexpected indent")),
                _ => self.parse_statement(&mut body)?,
            }
        }
        Ok(body)
    }

    fn parse_simple_statements(&mut self, out: &mut Vec<Stmt>) -> Result<(), SyntaxError> {
        loop {
            let stmt = self.parse_small_statement()?;
            out.push(stmt);
            if !self.eat(&Token::Semi) || matches!(self.peek(), Token::Newline | Token::Eof) {
                break;
            }
        }
        match self.peek() {
            Token::Newline => {
                self.advance();
                Ok(())
            }
            Token::Eof => Ok(()),
            _ => Err(self.unexpected()),
        }
    }

    fn parse_small_statement(&mut self) -> Result<Stmt, SyntaxError> {
        let line = self.cur().line;

        if let Token::Name(word) = self.peek() {
            let keyword = word.clone();
            match word.as_str() {
                "pass" | "break" | "continue" => {
                    self.advance();
                    return Ok(Stmt::Simple { keyword });
                }
                "import" | "from" | "global" | "nonlocal" => {
                    self.advance();
                    while !self.at_stmt_end() {
                        self.advance();
                    }
                    return Ok(Stmt::Simple { keyword });
                }
                "return" => {
                    self.advance();
                    if !self.at_stmt_end() {
                        self.parse_testlist_star_expr()?;
                    }
                    return Ok(Stmt::Simple { keyword });
                }
                "del" => {
                    self.advance();
                    let targets = self.parse_testlist_star_expr()?;
                    self.check_del_target(&targets)?;
                    return Ok(Stmt::Simple { keyword });
                }
                "raise" => {
                    self.advance();
                    if !self.at_stmt_end() {
                        self.parse_test()?;
                        if self.is_word("from") {
                            self.advance();
                            self.parse_test()?;
                        }
                    }
                    return Ok(Stmt::Simple { keyword });
                }
                "assert" => {
                    self.advance();
                    self.parse_test()?;
                    if self.eat(&Token::Comma) {
                        self.parse_test()?;
                    }
                    return Ok(Stmt::Simple { keyword });
                }
                _ => {}
            }
        }

        let first = self.parse_value_expr()?;
        match self.peek() {
            Token::Colon => {
                self.check_target(&first, false)?;
                self.advance();
                let annotation = self.parse_test()?;
                let value = if self.eat(&Token::Assign) {
                    Some(self.parse_value_expr()?)
                } else {
                    None
                };
                Ok(Stmt::AnnAssign {
                    target: first,
                    annotation,
                    value,
                    line,
                })
            }
            Token::Assign => {
                let mut exprs = vec![first];
                while self.eat(&Token::Assign) {
                    exprs.push(self.parse_value_expr()?);
                }
                let Some(value) = exprs.pop() else {
                    return Err(self.unexpected());
                };
                for target in &exprs {
                    self.check_target(target, true)?;
                }
                Ok(Stmt::Assign {
                    targets: exprs,
                    value,
                    line,
                })
            }
            Token::AugAssign(op) => {
                self.check_target(&first, false)?;
                self.advance();
                let value = self.parse_value_expr()?;
                Ok(Stmt::AugAssign {
                    target: first,
                    op: op.clone(),
                    value,
                })
            }
            _ => Ok(Stmt::Expr(first)),
        }
    }

    fn check_target(&self, expr: &Expr, multi: bool) -> Result<(), SyntaxError> {
        match &expr.kind {
            ExprKind::Name(_) | ExprKind::Attribute { .. } | ExprKind::Subscript { .. } => Ok(()),
            ExprKind::Tuple(elts) | ExprKind::List(elts) if multi => {
                elts.iter().try_for_each(|e| self.check_target(e, true))
            }
            ExprKind::Starred(inner) if multi => self.check_target(inner, true),
            ExprKind::Constant(_) | ExprKind::JoinedStr(_) => {
                Err(self.err("cannot assign to literal"))
            }
            _ => Err(self.err("cannot assign to expression")),
        }
    }

    fn check_del_target(&self, expr: &Expr) -> Result<(), SyntaxError> {
        match &expr.kind {
            ExprKind::Name(_) | ExprKind::Attribute { .. } | ExprKind::Subscript { .. } => Ok(()),
            ExprKind::Tuple(elts) | ExprKind::List(elts) => {
                elts.iter().try_for_each(|e| self.check_del_target(e))
            }
            _ => Err(self.err("cannot delete expression")),
        }
    }

    // -- Expressions ---------------------------------------------

    /// Right-hand side of an assignment or an expression statement, where a
    /// bare `yield` is also allowed.
    fn parse_value_expr(&mut self) -> Result<Expr, SyntaxError> {
        if self.is_word("yield") {
            return self.parse_yield();
        }
        self.parse_testlist_star_expr()
    }

    fn parse_yield(&mut self) -> Result<Expr, SyntaxError> {
        let start = self.start();
        self.advance();
        if self.is_word("from") {
            self.advance();
            let value = self.parse_test()?;
            return Ok(Expr::new(
                ExprKind::YieldFrom(Box::new(value)),
                self.span_from(start),
            ));
        }
        let value = if self.at_expr_end() {
            None
        } else {
            Some(Box::new(self.parse_testlist_star_expr()?))
        };
        Ok(Expr::new(ExprKind::Yield(value), self.span_from(start)))
    }

    fn parse_testlist_star_expr(&mut self) -> Result<Expr, SyntaxError> {
        let start = self.start();
        let first = self.parse_star_or_test()?;
        if self.peek() != &Token::Comma {
            return Ok(first);
        }
        let mut elts = vec![first];
        while self.eat(&Token::Comma) {
            if self.at_expr_end() {
                break;
            }
            elts.push(self.parse_star_or_test()?);
        }
        Ok(Expr::new(ExprKind::Tuple(elts), self.span_from(start)))
    }

    fn parse_starred(&mut self) -> Result<Expr, SyntaxError> {
        let start = self.start();
        self.advance();
        let inner = self.parse_bitor()?;
        Ok(Expr::new(
            ExprKind::Starred(Box::new(inner)),
            self.span_from(start),
        ))
    }

    fn parse_star_or_test(&mut self) -> Result<Expr, SyntaxError> {
        if self.is_op("*") {
            return self.parse_starred();
        }
        self.parse_test()
    }

    fn parse_star_or_named(&mut self) -> Result<Expr, SyntaxError> {
        if self.is_op("*") {
            return self.parse_starred();
        }
        self.parse_named_expr()
    }

    fn parse_named_expr(&mut self) -> Result<Expr, SyntaxError> {
        let start = self.start();
        let target = self.parse_test()?;
        if self.peek() != &Token::Walrus {
            return Ok(target);
        }
        if target.as_name().is_none() {
            return Err(self.err("cannot use assignment expressions with expression"));
        }
        self.advance();
        let value = self.parse_test()?;
        Ok(Expr::new(
            ExprKind::NamedExpr {
                target: Box::new(target),
                value: Box::new(value),
            },
            self.span_from(start),
        ))
    }

    fn parse_test(&mut self) -> Result<Expr, SyntaxError> {
        self.nested(Self::parse_conditional)
    }

    fn parse_conditional(&mut self) -> Result<Expr, SyntaxError> {
        if self.is_word("lambda") {
            return self.parse_lambda();
        }
        let start = self.start();
        let body = self.parse_or_test()?;
        if !self.is_word("if") {
            return Ok(body);
        }
        self.advance();
        let test = self.parse_or_test()?;
        self.expect_word("else")?;
        let orelse = self.parse_test()?;
        Ok(Expr::new(
            ExprKind::IfExp {
                test: Box::new(test),
                body: Box::new(body),
                orelse: Box::new(orelse),
            },
            self.span_from(start),
        ))
    }

    fn parse_lambda(&mut self) -> Result<Expr, SyntaxError> {
        let start = self.start();
        self.advance();
        self.skip_to_colon()?;
        self.advance();
        let body = self.parse_test()?;
        Ok(Expr::new(
            ExprKind::Lambda {
                body: Box::new(body),
            },
            self.span_from(start),
        ))
    }

    fn parse_or_test(&mut self) -> Result<Expr, SyntaxError> {
        self.parse_bool_op("or")
    }

    fn parse_bool_op(&mut self, op: &str) -> Result<Expr, SyntaxError> {
        let start = self.start();
        let operand = |p: &mut Self| {
            if op == "or" {
                p.parse_bool_op("and")
            } else {
                p.parse_not_test()
            }
        };
        let first = operand(self)?;
        if !self.is_word(op) {
            return Ok(first);
        }
        let mut values = vec![first];
        while self.is_word(op) {
            self.advance();
            values.push(operand(self)?);
        }
        Ok(Expr::new(
            ExprKind::BoolOp {
                op: op.to_string(),
                values,
            },
            self.span_from(start),
        ))
    }

    fn parse_not_test(&mut self) -> Result<Expr, SyntaxError> {
        if !self.is_word("not") {
            return self.parse_comparison();
        }
        let start = self.start();
        self.advance();
        let operand = self.nested(Self::parse_not_test)?;
        Ok(Expr::new(
            ExprKind::UnaryOp {
                op: UnaryOp::Not,
                operand: Box::new(operand),
            },
            self.span_from(start),
        ))
    }

    fn parse_comparison(&mut self) -> Result<Expr, SyntaxError> {
        let start = self.start();
        let left = self.parse_bitor()?;
        let mut ops = Vec::new();
        loop {
            let next_is = |w: &str| matches!(self.peek_at(1), Token::Name(n) if n == w);
            let (op, width) = match self.peek() {
                Token::Op(o) if matches!(o.as_str(), "<" | ">" | "==" | ">=" | "<=" | "!=") => {
                    (o.clone(), 1)
                }
                Token::Name(w) if w == "in" => ("in".to_string(), 1),
                Token::Name(w) if w == "is" && next_is("not") => ("is not".to_string(), 2),
                Token::Name(w) if w == "is" => ("is".to_string(), 1),
                Token::Name(w) if w == "not" && next_is("in") => ("not in".to_string(), 2),
                _ => break,
            };
            for _ in 0..width {
                self.advance();
            }
            let right = self.parse_bitor()?;
            ops.push((op, right));
        }
        if ops.is_empty() {
            return Ok(left);
        }
        Ok(Expr::new(
            ExprKind::Compare {
                left: Box::new(left),
                ops,
            },
            self.span_from(start),
        ))
    }

    fn parse_bitor(&mut self) -> Result<Expr, SyntaxError> {
        self.parse_binary(0)
    }

    fn parse_binary(&mut self, level: usize) -> Result<Expr, SyntaxError> {
        let Some(ops) = BINARY_LEVELS.get(level) else {
            return self.parse_factor();
        };
        let start = self.start();
        let mut left = self.parse_binary(level + 1)?;
        loop {
            let op = match self.peek() {
                Token::Op(o) if ops.contains(&o.as_str()) => o.clone(),
                _ => break,
            };
            self.advance();
            let right = self.parse_binary(level + 1)?;
            left = Expr::new(
                ExprKind::BinOp {
                    left: Box::new(left),
                    op,
                    right: Box::new(right),
                },
                self.span_from(start),
            );
        }
        Ok(left)
    }

    fn parse_factor(&mut self) -> Result<Expr, SyntaxError> {
        let op = match self.peek() {
            Token::Op(o) if o == "-" => UnaryOp::Neg,
            Token::Op(o) if o == "+" => UnaryOp::Pos,
            Token::Op(o) if o == "~" => UnaryOp::Invert,
            _ => return self.parse_power(),
        };
        let start = self.start();
        self.advance();
        let operand = self.nested(Self::parse_factor)?;
        Ok(Expr::new(
            ExprKind::UnaryOp {
                op,
                operand: Box::new(operand),
            },
            self.span_from(start),
        ))
    }

    fn parse_power(&mut self) -> Result<Expr, SyntaxError> {
        let start = self.start();
        let base = if self.is_word("await") {
            self.advance();
            let inner = self.parse_primary()?;
            Expr::new(ExprKind::Await(Box::new(inner)), self.span_from(start))
        } else {
            self.parse_primary()?
        };
        if !self.is_op("**") {
            return Ok(base);
        }
        self.advance();
        let exponent = self.nested(Self::parse_factor)?;
        Ok(Expr::new(
            ExprKind::BinOp {
                left: Box::new(base),
                op: "**".to_string(),
                right: Box::new(exponent),
            },
            self.span_from(start),
        ))
    }

    fn parse_primary(&mut self) -> Result<Expr, SyntaxError> {
        let start = self.start();
        let mut expr = self.parse_atom()?;
        loop {
            let kind = match self.peek() {
                Token::Dot => {
                    self.advance();
                    let attr = match self.peek() {
                        Token::Name(n) => n.clone(),
                        other => {
                            return Err(self.err(format!(
                                "expected attribute name, got {}",
                                describe(other)
                            )))
                        }
                    };
                    self.advance();
                    ExprKind::Attribute {
                        value: Box::new(expr),
                        attr,
                    }
                }
                Token::LParen => {
                    self.advance();
                    let (args, keywords) = self.parse_call_args()?;
                    ExprKind::Call {
                        func: Box::new(expr),
                        args,
                        keywords,
                    }
                }
                Token::LBracket => {
                    self.advance();
                    let index = self.parse_subscript()?;
                    self.expect(Token::RBracket, "']'")?;
                    ExprKind::Subscript {
                        value: Box::new(expr),
                        index: Box::new(index),
                    }
                }
                _ => break,
            };
            expr = Expr::new(kind, self.span_from(start));
        }
        Ok(expr)
    }

    fn parse_call_args(&mut self) -> Result<(Vec<Expr>, Vec<Keyword>), SyntaxError> {
        let mut args = Vec::new();
        let mut keywords = Vec::new();

        while self.peek() != &Token::RParen {
            if self.is_op("*") {
                let start = self.start();
                self.advance();
                let inner = self.parse_test()?;
                args.push(Expr::new(
                    ExprKind::Starred(Box::new(inner)),
                    self.span_from(start),
                ));
            } else if self.is_op("**") {
                self.advance();
                let value = self.parse_test()?;
                keywords.push(Keyword { name: None, value });
            } else if let (Token::Name(name), Token::Assign) = (self.peek(), self.peek_at(1)) {
                self.advance();
                self.advance();
                let value = self.parse_test()?;
                keywords.push(Keyword {
                    name: Some(name.clone()),
                    value,
                });
            } else {
                if !keywords.is_empty() {
                    return Err(self.err("positional argument follows keyword argument"));
                }
                let start = self.start();
                let arg = self.parse_named_expr()?;
                if self.is_comp_for() {
                    let generators = self.parse_comp_for()?;
                    args.push(Expr::new(
                        ExprKind::GeneratorExp {
                            element: Box::new(arg),
                            generators,
                        },
                        self.span_from(start),
                    ));
                } else {
                    args.push(arg);
                }
            }
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        self.expect(Token::RParen, "')'")?;
        Ok((args, keywords))
    }

    fn parse_comp_for(&mut self) -> Result<Vec<Comprehension>, SyntaxError> {
        let mut generators = Vec::new();
        while self.is_comp_for() {
            if self.is_word("async") {
                self.advance();
            }
            self.advance();
            let target = self.parse_target_list()?;
            self.expect_word("in")?;
            let iter = self.parse_or_test()?;
            let mut conditions = Vec::new();
            while self.is_word("if") {
                self.advance();
                conditions.push(self.parse_or_test()?);
            }
            generators.push(Comprehension {
                target,
                iter,
                conditions,
            });
        }
        Ok(generators)
    }

    fn parse_target_list(&mut self) -> Result<Expr, SyntaxError> {
        let start = self.start();
        let first = self.parse_star_target()?;
        let target = if self.peek() == &Token::Comma {
            let mut elts = vec![first];
            while self.eat(&Token::Comma) {
                if self.at_expr_end() {
                    break;
                }
                elts.push(self.parse_star_target()?);
            }
            Expr::new(ExprKind::Tuple(elts), self.span_from(start))
        } else {
            first
        };
        self.check_target(&target, true)?;
        Ok(target)
    }

    fn parse_star_target(&mut self) -> Result<Expr, SyntaxError> {
        if self.is_op("*") {
            return self.parse_starred();
        }
        self.parse_bitor()
    }

    fn parse_subscript(&mut self) -> Result<Expr, SyntaxError> {
        let start = self.start();
        let first = self.parse_slice_item()?;
        if self.peek() != &Token::Comma {
            return Ok(first);
        }
        let mut elts = vec![first];
        while self.eat(&Token::Comma) {
            if self.peek() == &Token::RBracket {
                break;
            }
            elts.push(self.parse_slice_item()?);
        }
        Ok(Expr::new(ExprKind::Tuple(elts), self.span_from(start)))
    }

    fn parse_slice_item(&mut self) -> Result<Expr, SyntaxError> {
        let start = self.start();
        let mut lower = None;
        if self.peek() != &Token::Colon {
            let item = self.parse_star_or_named()?;
            if self.peek() != &Token::Colon {
                return Ok(item);
            }
            lower = Some(Box::new(item));
        }
        self.advance();

        let bound_end = |p: &Self| matches!(p.peek(), Token::Colon | Token::Comma | Token::RBracket);
        let upper = if bound_end(self) {
            None
        } else {
            Some(Box::new(self.parse_test()?))
        };
        let step = if self.eat(&Token::Colon) && !bound_end(self) {
            Some(Box::new(self.parse_test()?))
        } else {
            None
        };
        Ok(Expr::new(
            ExprKind::Slice { lower, upper, step },
            self.span_from(start),
        ))
    }

    fn parse_atom(&mut self) -> Result<Expr, SyntaxError> {
        let tok = self.cur();
        let kind = match &tok.token {
            Token::Name(name) => match name.as_str() {
                "True" => ExprKind::Constant(Constant::Bool(true)),
                "False" => ExprKind::Constant(Constant::Bool(false)),
                "None" => ExprKind::Constant(Constant::None),
                w if RESERVED.contains(&w) => return Err(self.unexpected()),
                _ => ExprKind::Name(name.clone()),
            },
            Token::Int(text) => ExprKind::Constant(Constant::Int(text.clone())),
            Token::Float(text) => ExprKind::Constant(Constant::Float(text.clone())),
            Token::Imag(text) => ExprKind::Constant(Constant::Imag(text.clone())),
            Token::Ellipsis => ExprKind::Constant(Constant::Ellipsis),
            Token::Str { .. } => return self.parse_strings(),
            Token::LParen => return self.parse_paren(),
            Token::LBracket => return self.parse_list(),
            Token::LBrace => return self.parse_brace(),
            _ => return Err(self.unexpected()),
        };
        self.advance();
        Ok(Expr::new(kind, tok.span))
    }

    /// Adjacent string literals concatenate; any f-string among them turns
    /// the whole run into a joined string.
    fn parse_strings(&mut self) -> Result<Expr, SyntaxError> {
        let start = self.start();
        let mut parts = Vec::new();
        let mut has_format = false;
        let mut bytes: Option<bool> = None;

        while let Token::Str { value, kind, raw } = self.peek() {
            let line = self.cur().line;
            let is_bytes = *kind == StrKind::Bytes;
            if bytes.is_some_and(|b| b != is_bytes) {
                return Err(self.err("cannot mix bytes and nonbytes literals"));
            }
            bytes = Some(is_bytes);
            if *kind == StrKind::Format {
                has_format = true;
                parts.extend(split_fstring(value, *raw, line)?);
            } else {
                parts.push(FStringPart::Literal(value.clone()));
            }
            self.advance();
        }

        let kind = if has_format {
            ExprKind::JoinedStr(merge_literals(parts))
        } else {
            let text: String = parts
                .into_iter()
                .map(|p| match p {
                    FStringPart::Literal(s) => s,
                    FStringPart::Expr { text } => text,
                })
                .collect();
            if bytes == Some(true) {
                ExprKind::Constant(Constant::Bytes(text))
            } else {
                ExprKind::Constant(Constant::Str(text))
            }
        };
        Ok(Expr::new(kind, self.span_from(start)))
    }

    fn parse_paren(&mut self) -> Result<Expr, SyntaxError> {
        let start = self.start();
        self.advance();
        if self.eat(&Token::RParen) {
            return Ok(Expr::new(ExprKind::Tuple(Vec::new()), self.span_from(start)));
        }
        if self.is_word("yield") {
            let expr = self.parse_yield()?;
            self.expect(Token::RParen, "')'")?;
            return Ok(Expr::new(expr.kind, self.span_from(start)));
        }

        let first = self.parse_star_or_named()?;
        if self.is_comp_for() {
            let generators = self.parse_comp_for()?;
            self.expect(Token::RParen, "')'")?;
            return Ok(Expr::new(
                ExprKind::GeneratorExp {
                    element: Box::new(first),
                    generators,
                },
                self.span_from(start),
            ));
        }
        if self.eat(&Token::RParen) {
            if matches!(first.kind, ExprKind::Starred(_)) {
                return Err(self.err("cannot use starred expression here"));
            }
            return Ok(first);
        }

        let mut elts = vec![first];
        while self.eat(&Token::Comma) {
            if self.peek() == &Token::RParen {
                break;
            }
            elts.push(self.parse_star_or_named()?);
        }
        self.expect(Token::RParen, "')'")?;
        Ok(Expr::new(ExprKind::Tuple(elts), self.span_from(start)))
    }

    fn parse_list(&mut self) -> Result<Expr, SyntaxError> {
        let start = self.start();
        self.advance();
        if self.eat(&Token::RBracket) {
            return Ok(Expr::new(ExprKind::List(Vec::new()), self.span_from(start)));
        }

        let first = self.parse_star_or_named()?;
        if self.is_comp_for() {
            let generators = self.parse_comp_for()?;
            self.expect(Token::RBracket, "']'")?;
            return Ok(Expr::new(
                ExprKind::ListComp {
                    element: Box::new(first),
                    generators,
                },
                self.span_from(start),
            ));
        }

        let mut elts = vec![first];
        while self.eat(&Token::Comma) {
            if self.peek() == &Token::RBracket {
                break;
            }
            elts.push(self.parse_star_or_named()?);
        }
        self.expect(Token::RBracket, "']'")?;
        Ok(Expr::new(ExprKind::List(elts), self.span_from(start)))
    }

    fn parse_dict_spread(&mut self) -> Result<DictItem, SyntaxError> {
        self.advance();
        let value = self.parse_bitor()?;
        Ok(DictItem { key: None, value })
    }

    fn parse_brace(&mut self) -> Result<Expr, SyntaxError> {
        let start = self.start();
        self.advance();
        if self.eat(&Token::RBrace) {
            return Ok(Expr::new(ExprKind::Dict(Vec::new()), self.span_from(start)));
        }

        let mut items = Vec::new();
        let mut elts = Vec::new();
        let is_dict = if self.is_op("**") {
            items.push(self.parse_dict_spread()?);
            true
        } else {
            let first = self.parse_star_or_named()?;
            if self.eat(&Token::Colon) {
                let value = self.parse_test()?;
                if self.is_comp_for() {
                    let generators = self.parse_comp_for()?;
                    self.expect(Token::RBrace, "'}'")?;
                    return Ok(Expr::new(
                        ExprKind::DictComp {
                            key: Box::new(first),
                            value: Box::new(value),
                            generators,
                        },
                        self.span_from(start),
                    ));
                }
                items.push(DictItem {
                    key: Some(first),
                    value,
                });
                true
            } else {
                if self.is_comp_for() {
                    let generators = self.parse_comp_for()?;
                    self.expect(Token::RBrace, "'}'")?;
                    return Ok(Expr::new(
                        ExprKind::SetComp {
                            element: Box::new(first),
                            generators,
                        },
                        self.span_from(start),
                    ));
                }
                elts.push(first);
                false
            }
        };

        while self.eat(&Token::Comma) {
            if self.peek() == &Token::RBrace {
                break;
            }
            if !is_dict {
                elts.push(self.parse_star_or_named()?);
            } else if self.is_op("**") {
                items.push(self.parse_dict_spread()?);
            } else {
                let key = self.parse_test()?;
                self.expect(Token::Colon, "':'")?;
                let value = self.parse_test()?;
                items.push(DictItem {
                    key: Some(key),
                    value,
                });
            }
        }
        self.expect(Token::RBrace, "'}'")?;

        let kind = if is_dict {
            ExprKind::Dict(items)
        } else {
            ExprKind::Set(elts)
        };
        Ok(Expr::new(kind, self.span_from(start)))
    }
}

/// Split an f-string body into literal text and `{...}` expression parts.
/// Embedded expressions are parsed to confirm they are well formed but are
/// kept as source text.
fn split_fstring(body: &str, raw: bool, line: u32) -> Result<Vec<FStringPart>, SyntaxError> {
    let fail = |msg: &str| SyntaxError::new(line, format!("f-string: {}", msg));
    let finish = |literal: &str| -> Result<String, SyntaxError> {
        if raw {
            Ok(literal.to_string())
        } else {
            unescape(literal, false).map_err(|m| fail(&m))
        }
    };

    let chars: Vec<(usize, char)> = body.char_indices().collect();
    let offset = |idx: usize| chars.get(idx).map(|&(o, _)| o).unwrap_or(body.len());
    let mut parts = Vec::new();
    let mut literal = String::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i].1;
        let next = chars.get(i + 1).map(|&(_, n)| n);
        match c {
            '{' if next == Some('{') => {
                literal.push('{');
                i += 2;
            }
            '}' if next == Some('}') => {
                literal.push('}');
                i += 2;
            }
            '}' => return Err(fail("single '}' is not allowed")),
            '{' => {
                if !literal.is_empty() {
                    parts.push(FStringPart::Literal(finish(&literal)?));
                    literal.clear();
                }
                let (expr_end, close) =
                    scan_replacement_field(&chars, i + 1).ok_or_else(|| fail("expecting '}'"))?;
                let text = body[offset(i + 1)..offset(expr_end)].trim();
                if text.is_empty() {
                    return Err(fail("valid expression required before '}'"));
                }
                if text.contains('\\') {
                    return Err(fail("expression part cannot include a backslash"));
                }
                if text.contains('#') {
                    return Err(fail("expression part cannot include '#'"));
                }
                let expr_text = text
                    .strip_suffix('=')
                    .filter(|t| !t.ends_with(&['=', '!', '<', '>'][..]))
                    .unwrap_or(text);
                parse_expression(expr_text).map_err(|e| fail(&e.message))?;
                parts.push(FStringPart::Expr {
                    text: text.to_string(),
                });
                i = close + 1;
            }
            '\\' if !raw => {
                literal.push('\\');
                if let Some(n) = next {
                    literal.push(n);
                }
                i += 2;
            }
            _ => {
                literal.push(c);
                i += 1;
            }
        }
    }

    if !literal.is_empty() {
        parts.push(FStringPart::Literal(finish(&literal)?));
    }
    Ok(parts)
}

/// Find the end of a replacement field's expression (at a top-level `!`,
/// `:` or `}`) and the index of its closing `}`.
fn scan_replacement_field(chars: &[(usize, char)], from: usize) -> Option<(usize, usize)> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut expr_end: Option<usize> = None;
    let mut spec_depth = 0usize;

    for (i, &(_, c)) in chars.iter().enumerate().skip(from) {
        if let Some(end) = expr_end {
            match c {
                '{' => spec_depth += 1,
                '}' if spec_depth > 0 => spec_depth -= 1,
                '}' => return Some((end, i)),
                _ => {}
            }
            continue;
        }
        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' => quote = Some(c),
            '(' | '[' | '{' => depth += 1,
            ')' | ']' => depth = depth.saturating_sub(1),
            '}' if depth > 0 => depth -= 1,
            '}' => return Some((i, i)),
            '!' if depth == 0 && chars.get(i + 1).map(|&(_, n)| n) != Some('=') => {
                expr_end = Some(i)
            }
            ':' if depth == 0 => expr_end = Some(i),
            _ => {}
        }
    }
    None
}

fn merge_literals(parts: Vec<FStringPart>) -> Vec<FStringPart> {
    let mut merged: Vec<FStringPart> = Vec::with_capacity(parts.len());
    for part in parts {
        match (merged.last_mut(), part) {
            (_, FStringPart::Literal(s)) if s.is_empty() => {}
            (Some(FStringPart::Literal(prev)), FStringPart::Literal(s)) => prev.push_str(&s),
            (_, part) => merged.push(part),
        }
    }
    merged
}

fn describe(token: &Token) -> String {
    let punct = match token {
        Token::Name(n) => return format!("'{}'", n),
        Token::Str { .. } => return "string literal".to_string(),
        Token::Int(t) | Token::Float(t) | Token::Imag(t) | Token::Op(t) => {
            return format!("'{}'", t)
        }
        Token::AugAssign(op) => return format!("'{}='", op),
        Token::Newline => return "end of line".to_string(),
        Token::Indent => return "indent".to_string(),
        Token::Dedent => return "dedent".to_string(),
        Token::Eof => return "end of file".to_string(),
        Token::LParen => "(",
        Token::RParen => ")",
        Token::LBracket => "[",
        Token::RBracket => "]",
        Token::LBrace => "{",
        Token::RBrace => "}",
        Token::Colon => ":",
        Token::Comma => ",",
        Token::Semi => ";",
        Token::Dot => ".",
        Token::Ellipsis => "...",
        Token::Arrow => "->",
        Token::Assign => "=",
        Token::Walrus => ":=",
    };
    format!("'{}'", punct)
}
