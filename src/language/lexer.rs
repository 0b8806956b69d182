use crate::language::{
    span::Span,
    token::{TemplatePart, Token, TokenKind},
};

#[derive(Debug)]
pub struct LexError {
    pub message: String,
    pub span: Span,
}

pub fn lex(source: &str) -> Result<Vec<Token>, Vec<LexError>> {
    let lexer = Lexer::new(source);
    lexer.run()
}

struct Lexer<'a> {
    src: &'a str,
    chars: std::str::Chars<'a>,
    current: Option<char>,
    offset: usize,
    tokens: Vec<Token>,
    errors: Vec<LexError>,
    saw_newline: bool,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        let mut chars = src.chars();
        let current = chars.next();
        Self {
            src,
            chars,
            current,
            offset: 0,
            tokens: Vec::new(),
            errors: Vec::new(),
            saw_newline: false,
        }
    }

    fn run(mut self) -> Result<Vec<Token>, Vec<LexError>> {
        while let Some(ch) = self.current {
            match ch {
                '/' if self.peek() == Some('/') => self.eat_line_comment(),
                '/' if self.peek() == Some('*') => self.eat_block_comment(),
                '\n' => {
                    self.saw_newline = true;
                    self.bump();
                }
                ch if ch.is_whitespace() => {
                    self.bump();
                }
                ch if ch.is_ascii_alphabetic() || ch == '_' || ch == '$' => self.lex_identifier(),
                ch if ch.is_ascii_digit() => self.lex_number(),
                '"' | '\'' => self.lex_string(ch),
                '`' => self.lex_template_string(),
                _ => self.lex_symbol(),
            }
        }
        self.push_token(TokenKind::Eof, self.offset, self.offset);

        if self.errors.is_empty() {
            Ok(self.tokens)
        } else {
            Err(self.errors)
        }
    }

    fn bump(&mut self) -> Option<char> {
        if let Some(ch) = self.current {
            self.offset += ch.len_utf8();
        }
        self.current = self.chars.next();
        self.current
    }

    fn peek(&self) -> Option<char> {
        self.chars.clone().next()
    }

    fn push_token(&mut self, kind: TokenKind, start: usize, end: usize) {
        self.tokens.push(Token {
            kind,
            span: Span::new(start, end),
            newline_before: std::mem::take(&mut self.saw_newline),
        });
    }

    fn error(&mut self, start: usize, end: usize, message: impl Into<String>) {
        self.errors.push(LexError {
            message: message.into(),
            span: Span::new(start, end),
        });
    }

    fn eat_line_comment(&mut self) {
        self.bump();
        self.bump();
        while let Some(ch) = self.current {
            if ch == '\n' {
                break;
            }
            self.bump();
        }
    }

    fn eat_block_comment(&mut self) {
        let start = self.offset;
        self.bump();
        self.bump();
        while let Some(ch) = self.current {
            if ch == '*' && self.peek() == Some('/') {
                self.bump();
                self.bump();
                return;
            }
            if ch == '\n' {
                self.saw_newline = true;
            }
            self.bump();
        }
        self.error(start, self.offset, "Unterminated block comment");
    }

    fn lex_identifier(&mut self) {
        let start = self.offset;
        while let Some(ch) = self.current {
            if ch.is_ascii_alphanumeric() || ch == '_' || ch == '$' {
                self.bump();
            } else {
                break;
            }
        }

        let end = self.offset;
        let slice = &self.src[start..end];
        let kind = match slice {
            "function" => TokenKind::Function,
            "let" => TokenKind::Let,
            "const" => TokenKind::Const,
            "var" => TokenKind::Var,
            "return" => TokenKind::Return,
            "if" => TokenKind::If,
            "else" => TokenKind::Else,
            "for" => TokenKind::For,
            "of" => TokenKind::Of,
            "while" => TokenKind::While,
            "break" => TokenKind::Break,
            "continue" => TokenKind::Continue,
            "throw" => TokenKind::Throw,
            "try" => TokenKind::Try,
            "catch" => TokenKind::Catch,
            "finally" => TokenKind::Finally,
            "typeof" => TokenKind::TypeOf,
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            "null" => TokenKind::Null,
            "undefined" => TokenKind::Undefined,
            _ => TokenKind::Identifier(slice.to_string()),
        };
        self.push_token(kind, start, end);
    }

    fn lex_number(&mut self) {
        let start = self.offset;
        while let Some(ch) = self.current {
            if ch.is_ascii_digit() {
                self.bump();
            } else {
                break;
            }
        }

        if self.current == Some('.') {
            if let Some(next) = self.peek() {
                if next.is_ascii_digit() {
                    self.bump(); // consume '.'
                    while let Some(ch) = self.current {
                        if ch.is_ascii_digit() {
                            self.bump();
                        } else {
                            break;
                        }
                    }
                }
            }
        }

        if matches!(self.current, Some('e') | Some('E')) {
            self.bump();
            if matches!(self.current, Some('+') | Some('-')) {
                self.bump();
            }
            while let Some(ch) = self.current {
                if ch.is_ascii_digit() {
                    self.bump();
                } else {
                    break;
                }
            }
        }

        let end = self.offset;
        let text = &self.src[start..end];
        match text.parse::<f64>() {
            Ok(value) => self.push_token(TokenKind::Number(value), start, end),
            Err(_) => self.error(start, end, "Invalid number literal"),
        }
    }

    fn lex_escape(&mut self) -> Option<char> {
        let escaped = self.current?;
        self.bump();
        Some(match escaped {
            'n' => '\n',
            'r' => '\r',
            't' => '\t',
            '0' => '\0',
            other => other,
        })
    }

    fn lex_string(&mut self, quote: char) {
        let start = self.offset;
        self.bump();
        let mut value = String::new();
        while let Some(ch) = self.current {
            match ch {
                '\n' => break,
                ch if ch == quote => {
                    self.bump();
                    let end = self.offset;
                    self.push_token(TokenKind::String(value), start, end);
                    return;
                }
                '\\' => {
                    self.bump();
                    match self.lex_escape() {
                        Some(escaped) => value.push(escaped),
                        None => break,
                    }
                }
                _ => {
                    value.push(ch);
                    self.bump();
                }
            }
        }
        self.error(start, self.offset, "Unterminated string literal");
    }

    fn lex_template_string(&mut self) {
        let start = self.offset;
        self.bump();
        let mut parts = Vec::new();
        let mut text = String::new();
        while let Some(ch) = self.current {
            match ch {
                '`' => {
                    self.bump();
                    if !text.is_empty() {
                        parts.push(TemplatePart::Text(text));
                    }
                    let end = self.offset;
                    self.push_token(TokenKind::Template(parts), start, end);
                    return;
                }
                '\\' => {
                    self.bump();
                    match self.lex_escape() {
                        Some(escaped) => text.push(escaped),
                        None => break,
                    }
                }
                '$' if self.peek() == Some('{') => {
                    if !text.is_empty() {
                        parts.push(TemplatePart::Text(std::mem::take(&mut text)));
                    }
                    self.bump();
                    self.bump();
                    let expr_start = self.offset;
                    if !self.skip_substitution() {
                        self.error(start, self.offset, "Unterminated template substitution");
                        return;
                    }
                    let expr_end = self.offset;
                    parts.push(TemplatePart::Expr(
                        self.src[expr_start..expr_end].to_string(),
                        expr_start,
                    ));
                    self.bump(); // closing '}'
                }
                _ => {
                    text.push(ch);
                    self.bump();
                }
            }
        }
        self.error(start, self.offset, "Unterminated template string");
    }

    /// Advances to the `}` closing a `${` substitution; nested braces and
    /// quoted strings are skipped over.
    fn skip_substitution(&mut self) -> bool {
        let mut depth = 0usize;
        while let Some(ch) = self.current {
            match ch {
                '{' => depth += 1,
                '}' if depth == 0 => return true,
                '}' => depth -= 1,
                '"' | '\'' | '`' => {
                    let quote = ch;
                    self.bump();
                    while let Some(inner) = self.current {
                        if inner == '\\' {
                            self.bump();
                        } else if inner == quote {
                            break;
                        }
                        self.bump();
                    }
                }
                _ => {}
            }
            self.bump();
        }
        false
    }

    fn lex_symbol(&mut self) {
        let start = self.offset;
        let ch = self.current;
        match ch {
            Some('(') => self.single(TokenKind::LParen),
            Some(')') => self.single(TokenKind::RParen),
            Some('{') => self.single(TokenKind::LBrace),
            Some('}') => self.single(TokenKind::RBrace),
            Some('[') => self.single(TokenKind::LBracket),
            Some(']') => self.single(TokenKind::RBracket),
            Some(',') => self.single(TokenKind::Comma),
            Some('.') => self.single(TokenKind::Dot),
            Some(':') => self.single(TokenKind::Colon),
            Some(';') => self.single(TokenKind::Semi),
            Some('?') => self.single(TokenKind::Question),
            Some('+') => {
                self.bump();
                match self.current {
                    Some('+') => self.finish(TokenKind::PlusPlus, start),
                    Some('=') => self.finish(TokenKind::PlusEq, start),
                    _ => self.push_token(TokenKind::Plus, start, self.offset),
                }
            }
            Some('-') => {
                self.bump();
                match self.current {
                    Some('-') => self.finish(TokenKind::MinusMinus, start),
                    Some('=') => self.finish(TokenKind::MinusEq, start),
                    _ => self.push_token(TokenKind::Minus, start, self.offset),
                }
            }
            Some('*') => self.with_eq(TokenKind::Star, TokenKind::StarEq, start),
            Some('/') => self.with_eq(TokenKind::Slash, TokenKind::SlashEq, start),
            Some('%') => self.with_eq(TokenKind::Percent, TokenKind::PercentEq, start),
            Some('&') => {
                self.bump();
                if self.current == Some('&') {
                    self.finish(TokenKind::AmpersandAmpersand, start);
                } else {
                    self.error(start, self.offset, "Bitwise `&` is not supported");
                }
            }
            Some('|') => {
                self.bump();
                if self.current == Some('|') {
                    self.finish(TokenKind::PipePipe, start);
                } else {
                    self.error(start, self.offset, "Bitwise `|` is not supported");
                }
            }
            Some('!') => {
                self.bump();
                if self.current == Some('=') {
                    self.bump();
                    if self.current == Some('=') {
                        self.finish(TokenKind::BangEqEq, start);
                    } else {
                        self.push_token(TokenKind::BangEq, start, self.offset);
                    }
                } else {
                    self.push_token(TokenKind::Bang, start, self.offset);
                }
            }
            Some('=') => {
                self.bump();
                match self.current {
                    Some('>') => self.finish(TokenKind::FatArrow, start),
                    Some('=') => {
                        self.bump();
                        if self.current == Some('=') {
                            self.finish(TokenKind::EqEqEq, start);
                        } else {
                            self.push_token(TokenKind::EqEq, start, self.offset);
                        }
                    }
                    _ => self.push_token(TokenKind::Eq, start, self.offset),
                }
            }
            Some('<') => self.with_eq(TokenKind::Lt, TokenKind::LtEq, start),
            Some('>') => self.with_eq(TokenKind::Gt, TokenKind::GtEq, start),
            Some(ch) => {
                self.bump();
                self.error(start, self.offset, format!("Unexpected character '{}'", ch));
            }
            None => {}
        }
    }

    fn single(&mut self, kind: TokenKind) {
        let start = self.offset;
        self.bump();
        self.push_token(kind, start, self.offset);
    }

    /// Consumes the current character as the last one of a multi-char token.
    fn finish(&mut self, kind: TokenKind, start: usize) {
        self.bump();
        self.push_token(kind, start, self.offset);
    }

    fn with_eq(&mut self, plain: TokenKind, with_eq: TokenKind, start: usize) {
        self.bump();
        if self.current == Some('=') {
            self.finish(with_eq, start);
        } else {
            self.push_token(plain, start, self.offset);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        lex(src)
            .expect("lex")
            .into_iter()
            .map(|token| token.kind)
            .collect()
    }

    #[test]
    fn lexes_handler_declaration() {
        let tokens = kinds("function foo(f, s) { post(\"foo: \" + f); }");
        assert_eq!(tokens[0], TokenKind::Function);
        assert_eq!(tokens[1], TokenKind::Identifier("foo".into()));
        assert!(tokens.contains(&TokenKind::String("foo: ".into())));
        assert_eq!(tokens.last(), Some(&TokenKind::Eof));
    }

    #[test]
    fn numbers_are_floats() {
        assert_eq!(
            kinds("47.11 3 1e3")[..3],
            [
                TokenKind::Number(47.11),
                TokenKind::Number(3.0),
                TokenKind::Number(1000.0)
            ]
        );
    }

    #[test]
    fn template_keeps_substitution_source() {
        let tokens = kinds("`list ${args.length}: ${args.join(' ')}`");
        match &tokens[0] {
            TokenKind::Template(parts) => {
                assert_eq!(parts[0], TemplatePart::Text("list ".into()));
                assert!(matches!(&parts[1], TemplatePart::Expr(src, 8) if src == "args.length"));
                assert!(matches!(&parts[3], TemplatePart::Expr(src, _) if src == "args.join(' ')"));
            }
            other => panic!("expected template, got {other:?}"),
        }
    }

    #[test]
    fn strict_operators_are_single_tokens() {
        assert_eq!(
            kinds("a === b !== c")[1..4],
            [
                TokenKind::EqEqEq,
                TokenKind::Identifier("b".into()),
                TokenKind::BangEqEq
            ]
        );
    }

    #[test]
    fn records_line_breaks() {
        let tokens = lex("a\nb").expect("lex");
        assert!(!tokens[0].newline_before);
        assert!(tokens[1].newline_before);
    }

    #[test]
    fn unterminated_string_is_an_error() {
        let errors = lex("post('oops").expect_err("should fail");
        assert_eq!(errors[0].message, "Unterminated string literal");
    }
}
