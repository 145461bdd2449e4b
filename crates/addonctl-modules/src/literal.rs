//! Restricted literal evaluator for manifest files
//!
//! Manifests are a single mapping literal. This parser accepts literal atoms
//! (strings, numbers, `True`, `False`, `None`) and container constructors
//! (dict, list, tuple, set) only. Names, calls, operators and subscripts are
//! rejected, so reading a manifest never evaluates code.

use addonctl_core::types::ManifestValue;

/// Maximum container nesting accepted
const MAX_DEPTH: usize = 64;

/// Parse error with 1-based source position
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message} at line {line}, column {column}")]
pub struct LiteralError {
    pub message: String,
    pub line: usize,
    pub column: usize,
}

type ParseResult<T> = Result<T, LiteralError>;

/// Parse manifest source into a literal value
///
/// Source consisting only of whitespace and comments yields an empty dict.
pub fn parse_literal(source: &str) -> ParseResult<ManifestValue> {
    let source = source.strip_prefix('\u{feff}').unwrap_or(source);
    let mut parser = Parser::new(source);

    parser.skip_trivia()?;
    if parser.at_end() {
        return Ok(ManifestValue::Dict(Vec::new()));
    }

    let value = parser.parse_value(0)?;
    parser.skip_trivia()?;
    if !parser.at_end() {
        return Err(parser.error(format!(
            "unexpected {} after the manifest literal",
            parser.describe_current()
        )));
    }
    Ok(value)
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
}

impl Parser {
    fn new(source: &str) -> Self {
        // Universal newlines: CRLF and lone CR read as LF
        let source = source.replace("\r\n", "\n").replace('\r', "\n");
        Self {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn error(&self, message: impl Into<String>) -> LiteralError {
        LiteralError {
            message: message.into(),
            line: self.line,
            column: self.column,
        }
    }

    fn describe_current(&self) -> String {
        match self.peek() {
            Some(c) if c.is_alphabetic() || c == '_' => format!("name '{}'", self.peek_word()),
            Some(c) => format!("character '{}'", c),
            None => "end of file".to_string(),
        }
    }

    fn peek_word(&self) -> String {
        self.chars[self.pos..]
            .iter()
            .take_while(|c| c.is_alphanumeric() || **c == '_')
            .collect()
    }

    /// Skip whitespace, comments and backslash line continuations
    fn skip_trivia(&mut self) -> ParseResult<()> {
        while let Some(c) = self.peek() {
            match c {
                ' ' | '\t' | '\r' | '\n' | '\x0c' => {
                    self.bump();
                }
                '#' => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                '\\' => {
                    let next = self.peek_at(1);
                    let next2 = self.peek_at(2);
                    if next == Some('\n') || (next == Some('\r') && next2 == Some('\n')) {
                        self.bump();
                        while matches!(self.peek(), Some('\r') | Some('\n')) {
                            let done = self.peek() == Some('\n');
                            self.bump();
                            if done {
                                break;
                            }
                        }
                    } else {
                        return Err(self.error("unexpected character '\\'"));
                    }
                }
                _ => break,
            }
        }
        Ok(())
    }

    fn expect(&mut self, expected: char) -> ParseResult<()> {
        self.skip_trivia()?;
        match self.peek() {
            Some(c) if c == expected => {
                self.bump();
                Ok(())
            }
            _ => Err(self.error(format!(
                "expected '{}', found {}",
                expected,
                self.describe_current()
            ))),
        }
    }

    fn parse_value(&mut self, depth: usize) -> ParseResult<ManifestValue> {
        if depth > MAX_DEPTH {
            return Err(self.error("containers nested too deeply"));
        }
        self.skip_trivia()?;

        if self.at_string_start() {
            return self.parse_strings();
        }

        match self.peek() {
            None => Err(self.error("unexpected end of file, expected a value")),
            Some('{') => self.parse_brace(depth),
            Some('[') => {
                self.bump();
                let items = self.parse_items(']', depth)?;
                Ok(ManifestValue::List(items))
            }
            Some('(') => self.parse_paren(depth),
            Some(c) if c.is_ascii_digit() || c == '.' || c == '-' || c == '+' => self.parse_number(),
            Some(c) if c.is_alphabetic() || c == '_' => self.parse_keyword(),
            Some(c) => Err(self.error(format!("unexpected character '{}'", c))),
        }
    }

    /// `{}` is a dict; `{a, b}` is a set; `{k: v}` is a dict
    fn parse_brace(&mut self, depth: usize) -> ParseResult<ManifestValue> {
        self.bump();
        self.skip_trivia()?;
        if self.peek() == Some('}') {
            self.bump();
            return Ok(ManifestValue::Dict(Vec::new()));
        }

        let first = self.parse_value(depth + 1)?;
        self.skip_trivia()?;

        if self.peek() == Some(':') {
            self.bump();
            let value = self.parse_value(depth + 1)?;
            let mut entries = vec![(first, value)];
            loop {
                if !self.comma_or_close('}')? {
                    break;
                }
                let key = self.parse_value(depth + 1)?;
                self.expect(':')?;
                let value = self.parse_value(depth + 1)?;
                entries.push((key, value));
            }
            Ok(ManifestValue::Dict(entries))
        } else {
            let mut items = vec![first];
            while self.comma_or_close('}')? {
                items.push(self.parse_value(depth + 1)?);
            }
            Ok(ManifestValue::Set(items))
        }
    }

    /// `()` is an empty tuple, `(x)` is `x`, `(x,)` and `(x, y)` are tuples
    fn parse_paren(&mut self, depth: usize) -> ParseResult<ManifestValue> {
        self.bump();
        self.skip_trivia()?;
        if self.peek() == Some(')') {
            self.bump();
            return Ok(ManifestValue::Tuple(Vec::new()));
        }

        let first = self.parse_value(depth + 1)?;
        self.skip_trivia()?;
        match self.peek() {
            Some(')') => {
                self.bump();
                Ok(first)
            }
            Some(',') => {
                let mut items = vec![first];
                while self.comma_or_close(')')? {
                    items.push(self.parse_value(depth + 1)?);
                }
                Ok(ManifestValue::Tuple(items))
            }
            _ => Err(self.error(format!(
                "expected ',' or ')', found {}",
                self.describe_current()
            ))),
        }
    }

    fn parse_items(&mut self, close: char, depth: usize) -> ParseResult<Vec<ManifestValue>> {
        let mut items = Vec::new();
        self.skip_trivia()?;
        if self.peek() == Some(close) {
            self.bump();
            return Ok(items);
        }
        items.push(self.parse_value(depth + 1)?);
        while self.comma_or_close(close)? {
            items.push(self.parse_value(depth + 1)?);
        }
        Ok(items)
    }

    /// After an element: consume `,` (returning true if another element
    /// follows) or the closing bracket (returning false). Trailing commas
    /// are accepted.
    fn comma_or_close(&mut self, close: char) -> ParseResult<bool> {
        self.skip_trivia()?;
        match self.peek() {
            Some(c) if c == close => {
                self.bump();
                Ok(false)
            }
            Some(',') => {
                self.bump();
                self.skip_trivia()?;
                if self.peek() == Some(close) {
                    self.bump();
                    Ok(false)
                } else {
                    Ok(true)
                }
            }
            Some(c) if is_operator(c) => Err(self.error(format!(
                "operator '{}' is not allowed in a manifest literal",
                c
            ))),
            _ => Err(self.error(format!(
                "expected ',' or '{}', found {}",
                close,
                self.describe_current()
            ))),
        }
    }

    fn parse_keyword(&mut self) -> ParseResult<ManifestValue> {
        let word = self.peek_word();
        let (line, column) = (self.line, self.column);
        for _ in 0..word.chars().count() {
            self.bump();
        }

        let value = match word.as_str() {
            "True" => ManifestValue::Bool(true),
            "False" => ManifestValue::Bool(false),
            "None" => ManifestValue::None,
            _ => {
                self.skip_trivia()?;
                let message = if self.peek() == Some('(') {
                    format!("function call '{}(...)' is not allowed in a manifest literal", word)
                } else {
                    format!("name '{}' is not allowed in a manifest literal", word)
                };
                return Err(LiteralError {
                    message,
                    line,
                    column,
                });
            }
        };
        Ok(value)
    }

    fn parse_number(&mut self) -> ParseResult<ManifestValue> {
        let (line, column) = (self.line, self.column);
        let mut negative = false;
        while let Some(sign @ ('-' | '+')) = self.peek() {
            if sign == '-' {
                negative = !negative;
            }
            self.bump();
            self.skip_trivia()?;
        }

        match self.peek() {
            Some(c) if c.is_ascii_digit() || (c == '.' && self.peek_at(1).is_some_and(|d| d.is_ascii_digit())) => {}
            _ => {
                return Err(LiteralError {
                    message: "unary operators are only allowed before numbers".to_string(),
                    line,
                    column,
                })
            }
        }

        let mut text = String::new();
        while let Some(c) = self.peek() {
            let exponent_sign = (c == '-' || c == '+')
                && matches!(text.chars().last(), Some('e') | Some('E'))
                && !text.starts_with("0x")
                && !text.starts_with("0X");
            if c.is_ascii_alphanumeric() || c == '_' || c == '.' || exponent_sign {
                text.push(c);
                self.bump();
            } else {
                break;
            }
        }

        let number_error = |message: String| LiteralError {
            message,
            line,
            column,
        };
        let cleaned: String = text.chars().filter(|c| *c != '_').collect();
        let lower = cleaned.to_ascii_lowercase();

        let radix = if lower.starts_with("0x") {
            Some(16)
        } else if lower.starts_with("0o") {
            Some(8)
        } else if lower.starts_with("0b") {
            Some(2)
        } else {
            None
        };

        if let Some(radix) = radix {
            let digits = &lower[2..];
            let value = i64::from_str_radix(digits, radix)
                .map_err(|_| number_error(format!("invalid integer literal '{}'", text)))?;
            return Ok(ManifestValue::Int(if negative { -value } else { value }));
        }

        if lower.ends_with('j') {
            return Err(number_error(format!(
                "complex literal '{}' is not supported",
                text
            )));
        }

        if lower.contains('.') || lower.contains('e') {
            let value: f64 = lower
                .parse()
                .map_err(|_| number_error(format!("invalid float literal '{}'", text)))?;
            return Ok(ManifestValue::Float(if negative { -value } else { value }));
        }

        let value: i64 = lower
            .parse()
            .map_err(|_| number_error(format!("invalid integer literal '{}'", text)))?;
        Ok(ManifestValue::Int(if negative { -value } else { value }))
    }

    /// True at a quote, or at a valid string prefix immediately followed by a quote
    fn at_string_start(&self) -> bool {
        self.string_prefix_len().is_some()
    }

    fn string_prefix_len(&self) -> Option<usize> {
        let mut len = 0;
        while let Some(c) = self.peek_at(len) {
            if c == '\'' || c == '"' {
                let prefix: String = self.chars[self.pos..self.pos + len]
                    .iter()
                    .collect::<String>()
                    .to_ascii_lowercase();
                return match prefix.as_str() {
                    "" | "r" | "u" | "b" | "br" | "rb" => Some(len),
                    _ => None,
                };
            }
            if !c.is_ascii_alphabetic() || len >= 2 {
                return None;
            }
            len += 1;
        }
        None
    }

    /// One string literal plus any adjacent ones (implicit concatenation)
    fn parse_strings(&mut self) -> ParseResult<ManifestValue> {
        let mut out = self.parse_string()?;
        loop {
            self.skip_trivia()?;
            if !self.at_string_start() {
                break;
            }
            out.push_str(&self.parse_string()?);
        }
        Ok(ManifestValue::Str(out))
    }

    fn parse_string(&mut self) -> ParseResult<String> {
        let prefix_len = self.string_prefix_len().unwrap_or(0);
        let mut raw = false;
        for _ in 0..prefix_len {
            if let Some(c) = self.bump() {
                if c == 'r' || c == 'R' {
                    raw = true;
                }
            }
        }

        let (line, column) = (self.line, self.column);
        let quote = match self.bump() {
            Some(q) => q,
            None => return Err(self.error("unexpected end of file in string")),
        };
        let triple = self.peek() == Some(quote) && self.peek_at(1) == Some(quote);
        if triple {
            self.bump();
            self.bump();
        }

        let unterminated = || LiteralError {
            message: "unterminated string literal".to_string(),
            line,
            column,
        };

        let mut out = String::new();
        loop {
            let c = self.bump().ok_or_else(unterminated)?;
            if c == quote {
                if !triple {
                    return Ok(out);
                }
                if self.peek() == Some(quote) && self.peek_at(1) == Some(quote) {
                    self.bump();
                    self.bump();
                    return Ok(out);
                }
                out.push(c);
                continue;
            }
            if c == '\n' && !triple {
                return Err(unterminated());
            }
            if c != '\\' {
                out.push(c);
                continue;
            }

            let escaped = self.bump().ok_or_else(unterminated)?;
            if raw {
                out.push('\\');
                out.push(escaped);
                continue;
            }
            match escaped {
                '\n' => {}
                '\\' => out.push('\\'),
                '\'' => out.push('\''),
                '"' => out.push('"'),
                'n' => out.push('\n'),
                't' => out.push('\t'),
                'r' => out.push('\r'),
                'a' => out.push('\x07'),
                'b' => out.push('\x08'),
                'f' => out.push('\x0c'),
                'v' => out.push('\x0b'),
                '0'..='7' => {
                    let mut value = escaped.to_digit(8).unwrap_or(0);
                    for _ in 0..2 {
                        match self.peek().and_then(|d| d.to_digit(8)) {
                            Some(d) => {
                                value = value * 8 + d;
                                self.bump();
                            }
                            None => break,
                        }
                    }
                    out.push(char::from_u32(value).ok_or_else(|| self.error("invalid octal escape"))?);
                }
                'x' => out.push(self.parse_hex_escape(2)?),
                'u' => out.push(self.parse_hex_escape(4)?),
                'U' => out.push(self.parse_hex_escape(8)?),
                other => {
                    out.push('\\');
                    out.push(other);
                }
            }
        }
    }

    fn parse_hex_escape(&mut self, digits: usize) -> ParseResult<char> {
        let mut value: u32 = 0;
        for _ in 0..digits {
            let digit = self
                .peek()
                .and_then(|c| c.to_digit(16))
                .ok_or_else(|| self.error(format!("truncated escape sequence, expected {} hex digits", digits)))?;
            value = value * 16 + digit;
            self.bump();
        }
        char::from_u32(value).ok_or_else(|| self.error(format!("invalid code point {:#x}", value)))
    }
}

fn is_operator(c: char) -> bool {
    matches!(
        c,
        '+' | '-' | '*' | '/' | '%' | '@' | '&' | '|' | '^' | '~' | '<' | '>' | '=' | '!' | '.' | '['
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(v: &str) -> ManifestValue {
        ManifestValue::Str(v.to_string())
    }

    fn dict_get<'a>(value: &'a ManifestValue, key: &str) -> Option<&'a ManifestValue> {
        match value {
            ManifestValue::Dict(entries) => entries
                .iter()
                .find(|(k, _)| k.as_str() == Some(key))
                .map(|(_, v)| v),
            _ => None,
        }
    }

    #[test]
    fn test_typical_manifest() {
        let source = r#"
# -*- coding: utf-8 -*-
# Part of the sales suite.
{
    'name': 'Sales',
    'version': '1.2',
    'category': 'Sales/Sales',
    'depends': ['sales_team', 'payment', 'portal'],
    'data': [
        'security/ir.model.access.csv',
        'views/sale_views.xml',
    ],
    'installable': True,
    'auto_install': False,
    'application': True,
    'sequence': 5,
    'assets': {
        'web.assets_backend': [
            'sale/static/src/js/**/*',
            ('remove', 'sale/static/src/legacy/**/*'),
        ],
    },
    'license': 'LGPL-3',
}
"#;
        let value = parse_literal(source).unwrap();
        assert_eq!(dict_get(&value, "name"), Some(&s("Sales")));
        assert_eq!(dict_get(&value, "installable"), Some(&ManifestValue::Bool(true)));
        assert_eq!(dict_get(&value, "sequence"), Some(&ManifestValue::Int(5)));
        assert_eq!(
            dict_get(&value, "depends"),
            Some(&ManifestValue::List(vec![s("sales_team"), s("payment"), s("portal")]))
        );
        let assets = dict_get(&value, "assets").unwrap();
        assert!(matches!(assets, ManifestValue::Dict(_)));
    }

    #[test]
    fn test_empty_source_is_empty_dict() {
        assert_eq!(parse_literal("").unwrap(), ManifestValue::Dict(vec![]));
        assert_eq!(
            parse_literal("# only a comment\n\n").unwrap(),
            ManifestValue::Dict(vec![])
        );
    }

    #[test]
    fn test_sets_tuples_and_parens() {
        assert_eq!(
            parse_literal("{'a', 'b'}").unwrap(),
            ManifestValue::Set(vec![s("a"), s("b")])
        );
        assert_eq!(parse_literal("()").unwrap(), ManifestValue::Tuple(vec![]));
        assert_eq!(parse_literal("('x')").unwrap(), s("x"));
        assert_eq!(
            parse_literal("('x',)").unwrap(),
            ManifestValue::Tuple(vec![s("x")])
        );
    }

    #[test]
    fn test_string_forms() {
        assert_eq!(parse_literal(r#""a" 'b'  u"c""#).unwrap(), s("abc"));
        assert_eq!(parse_literal(r"r'\d+\n'").unwrap(), s(r"\d+\n"));
        assert_eq!(parse_literal(r"'tab\there\x41é'").unwrap(), s("tab\thereAé"));
        assert_eq!(
            parse_literal("'''multi\nline \"quoted\" '''").unwrap(),
            s("multi\nline \"quoted\" ")
        );
        assert_eq!(parse_literal(r"'it\'s'").unwrap(), s("it's"));
        assert_eq!(parse_literal(r"'\q'").unwrap(), s(r"\q"));
    }

    #[test]
    fn test_numbers() {
        assert_eq!(parse_literal("42").unwrap(), ManifestValue::Int(42));
        assert_eq!(parse_literal("-7").unwrap(), ManifestValue::Int(-7));
        assert_eq!(parse_literal("0x1F").unwrap(), ManifestValue::Int(31));
        assert_eq!(parse_literal("1_000").unwrap(), ManifestValue::Int(1000));
        assert_eq!(parse_literal("1.5").unwrap(), ManifestValue::Float(1.5));
        assert_eq!(parse_literal("2e-3").unwrap(), ManifestValue::Float(0.002));
    }

    #[test]
    fn test_rejects_names_and_calls() {
        let err = parse_literal("{'name': foo}").unwrap_err();
        assert!(err.message.contains("name 'foo'"), "{}", err);
        assert_eq!(err.line, 1);
        assert_eq!(err.column, 10);

        let err = parse_literal("{'data': open('x').read()}").unwrap_err();
        assert!(err.message.contains("function call"), "{}", err);

        let err = parse_literal("{'name': 'a' + 'b'}").unwrap_err();
        assert!(err.message.contains("operator '+'"), "{}", err);

        let err = parse_literal("{'x': f'{y}'}").unwrap_err();
        assert!(err.message.contains("name 'f'"), "{}", err);
    }

    #[test]
    fn test_rejects_syntax_errors() {
        assert!(parse_literal("{'name': 'x'").is_err());
        assert!(parse_literal("{'name' 1}").is_err());
        assert!(parse_literal("{'name': 'x'} {}").is_err());
        assert!(parse_literal("'unterminated").is_err());
        assert!(parse_literal("['a',, 'b']").is_err());
    }

    #[test]
    fn test_windows_line_endings() {
        let source = "{\r\n    'name': 'sa\\\r\nle',\r\n    'summary': '''one\r\ntwo''',\r\n}\r\n";
        let ManifestValue::Dict(entries) = parse_literal(source).unwrap() else {
            panic!("expected a dict");
        };
        assert_eq!(entries[0].1, ManifestValue::Str("sale".to_string()));
        assert_eq!(entries[1].1, ManifestValue::Str("one\ntwo".to_string()));
    }

    #[test]
    fn test_error_position_on_later_line() {
        let err = parse_literal("{\n  'depends': [\n    base,\n  ],\n}").unwrap_err();
        assert_eq!(err.line, 3);
        assert_eq!(err.column, 5);
    }

    #[test]
    fn test_nesting_limit() {
        let deep = "[".repeat(MAX_DEPTH + 5) + &"]".repeat(MAX_DEPTH + 5);
        let err = parse_literal(&deep).unwrap_err();
        assert!(err.message.contains("nested too deeply"));
    }
}
