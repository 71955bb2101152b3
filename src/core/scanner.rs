use std::iter::Peekable;

use owned_chars::OwnedChars;

use super::{Token, TokenType};

pub struct Scanner {
    // Scratch pad for Tokens
    scratch: String,
    chars: Peekable<OwnedChars>,
    tokens: Vec<Token>,
    line: usize,
    keep_comments: bool,
}

impl Scanner {
    /// Creates a new `Scanner` that takes ownership of `source`.
    #[must_use]
    pub fn new(source: String) -> Self {
        Scanner {
            scratch: String::with_capacity(256),
            chars: OwnedChars::from_string(source).peekable(),
            tokens: Vec::new(),
            line: 1,
            keep_comments: false,
        }
    }

    /// Keep `#` comments in the token stream instead of discarding them.
    #[must_use]
    pub fn with_comments(mut self) -> Self {
        self.keep_comments = true;
        self
    }

    /// Scans the whole source. Never fails: input that can't be tokenized
    /// becomes an `Error` token and the stream always ends with `Eof`.
    #[tracing::instrument(level = "trace", skip_all)]
    pub fn scan_tokens(mut self) -> Vec<Token> {
        while let Some(c) = self.advance() {
            self.scan_token(c);
            self.scratch.clear();
        }

        self.tokens
            .push(Token::new(TokenType::Eof, String::new(), self.line));

        tracing::debug!(tokens = self.tokens.len(), lines = self.line, "scanned source");
        self.tokens
    }

    fn scan_token(&mut self, c: char) {
        match c {
            ' ' | '\r' | '\t' => {}
            '\n' => self.line += 1,
            '(' => self.add_token(TokenType::LeftParen),
            ')' => self.add_token(TokenType::RightParen),
            ',' => self.add_token(TokenType::Comma),
            '.' => self.add_token(TokenType::Dot),
            '-' => self.add_token(TokenType::Minus),
            '+' => self.add_token(TokenType::Plus),
            '/' => self.add_token(TokenType::Slash),
            '*' => self.add_token(TokenType::Star),
            '!' => self.add_token(TokenType::Bang),
            '=' => self.add_token(TokenType::Equal),
            '<' => self.add_token(TokenType::Less),
            '>' => self.add_token(TokenType::Greater),
            '"' => self.string(),
            '@' => self.builtin(),
            '#' => self.comment(),
            c if c.is_ascii_digit() => self.number(),
            c if Scanner::is_word_char(Some(c)) => self.word(),
            c => {
                tracing::warn!(line = self.line, %c, "unexpected character");
                self.add_token(TokenType::Error(format!("unexpected character '{}'", c)));
            }
        }
    }

    fn string(&mut self) {
        let line = self.line;
        loop {
            match self.advance() {
                Some('"') => break,
                Some('\n') => self.line += 1,
                Some(_) => {}
                None => {
                    let lexeme = self.scratch.clone();
                    self.push_token(
                        TokenType::Error("unterminated string".to_owned()),
                        lexeme,
                        line,
                    );
                    return;
                }
            }
        }

        let value = self.scratch[1..self.scratch.len() - 1].to_owned();
        let lexeme = self.scratch.clone();
        self.push_token(TokenType::String(value), lexeme, line);
    }

    fn number(&mut self) {
        while Scanner::is_digit(self.peek()) {
            self.advance();
        }

        let token = match self.scratch.parse::<i64>() {
            Ok(n) => TokenType::Number(n),
            Err(e) => TokenType::Error(format!("malformed number literal: {}", e)),
        };
        self.add_token(token);
    }

    fn builtin(&mut self) {
        while Scanner::is_word_char(self.peek()) {
            self.advance();
        }

        self.add_token(TokenType::Builtin);
    }

    /// Scans a run of letters and underscores. The words `true` and `false`
    /// are matched greedily at the start of the run, so `trueish` yields the
    /// boolean `true` followed by the identifier `ish`.
    fn word(&mut self) {
        while Scanner::is_word_char(self.peek()) {
            self.advance();
        }

        let word = self.scratch.clone();
        let mut rest = word.as_str();
        loop {
            if let Some(tail) = rest.strip_prefix("true") {
                self.push_token(TokenType::Boolean(true), "true".to_owned(), self.line);
                rest = tail;
            } else if let Some(tail) = rest.strip_prefix("false") {
                self.push_token(TokenType::Boolean(false), "false".to_owned(), self.line);
                rest = tail;
            } else {
                if !rest.is_empty() {
                    self.push_token(TokenType::Identifier, rest.to_owned(), self.line);
                }
                break;
            }
        }
    }

    fn comment(&mut self) {
        while !matches!(self.peek(), None | Some('\n')) {
            self.advance();
        }

        if self.keep_comments {
            self.add_token(TokenType::Comment);
        }
    }

    /// Adapter for Option<char>
    fn is_word_char(c: Option<char>) -> bool {
        c.map_or(false, |c| c.is_alphabetic() || c == '_')
    }

    /// Adapter for Option<char>
    fn is_digit(c: Option<char>) -> bool {
        c.map_or(false, |c| c.is_ascii_digit())
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn advance(&mut self) -> Option<char> {
        self.chars.next().map(|c| {
            self.scratch.push(c);
            c
        })
    }

    fn add_token(&mut self, token: TokenType) {
        let lexeme = self.scratch.clone();
        self.push_token(token, lexeme, self.line);
    }

    fn push_token(&mut self, token: TokenType, lexeme: String, line: usize) {
        self.tokens.push(Token::new(token, lexeme, line));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn types(source: &str) -> Vec<TokenType> {
        Scanner::new(source.to_owned())
            .scan_tokens()
            .into_iter()
            .map(|t| t.token_type)
            .collect()
    }

    #[test]
    fn it_can_scan_a_var_statement() {
        let actual = Scanner::new("(@var (breakfast \"bagels\"))".to_owned()).scan_tokens();

        let expected = vec![
            Token::new(TokenType::LeftParen, String::from("("), 1),
            Token::new(TokenType::Builtin, String::from("@var"), 1),
            Token::new(TokenType::LeftParen, String::from("("), 1),
            Token::new(TokenType::Identifier, String::from("breakfast"), 1),
            Token::new(
                TokenType::String(String::from("bagels")),
                String::from("\"bagels\""),
                1,
            ),
            Token::new(TokenType::RightParen, String::from(")"), 1),
            Token::new(TokenType::RightParen, String::from(")"), 1),
            Token::new(TokenType::Eof, String::new(), 1),
        ];

        assert_eq!(expected, actual);
    }

    #[test]
    fn it_counts_lines_across_statements_and_strings() {
        let tokens = Scanner::new("(a)\n\"multi\nline\"\n(b)".to_owned()).scan_tokens();
        let lines: Vec<usize> = tokens.iter().map(Token::line).collect();

        // '(' 'a' ')' on 1, the string starts on 2, '(' 'b' ')' on 4
        assert_eq!(vec![1, 1, 1, 2, 4, 4, 4, 4], lines);
        assert_eq!(
            &TokenType::String("multi\nline".to_owned()),
            tokens[3].token_type()
        );
    }

    #[test]
    fn it_always_ends_with_eof() {
        assert_eq!(vec![TokenType::Eof], types(""));
        assert_eq!(vec![TokenType::Eof], types("   \n\t"));
    }

    #[test]
    fn it_reports_an_unterminated_string_as_an_error_token() {
        let tokens = types("(f \"oops)");
        assert_eq!(
            TokenType::Error("unterminated string".to_owned()),
            tokens[2]
        );
        assert_eq!(TokenType::Eof, tokens[3]);
    }

    #[test]
    fn it_scans_unsigned_integers_with_a_separate_minus() {
        assert_eq!(
            vec![TokenType::Minus, TokenType::Number(42), TokenType::Eof],
            types("-42")
        );
    }

    #[test]
    fn it_reports_an_overflowing_number_as_an_error_token() {
        let tokens = types("99999999999999999999999");
        assert!(matches!(tokens[0], TokenType::Error(_)));
    }

    #[test]
    fn it_matches_booleans_greedily() {
        assert_eq!(
            vec![
                TokenType::Boolean(true),
                TokenType::Identifier,
                TokenType::Boolean(false),
                TokenType::Eof
            ],
            types("trueish false")
        );

        let tokens = Scanner::new("trueish".to_owned()).scan_tokens();
        assert_eq!("ish", tokens[1].lexeme());
    }

    #[test]
    fn it_does_not_put_digits_in_identifiers() {
        let tokens = Scanner::new("x1 snake_case".to_owned()).scan_tokens();
        assert_eq!(&TokenType::Identifier, tokens[0].token_type());
        assert_eq!(&TokenType::Number(1), tokens[1].token_type());
        assert_eq!("snake_case", tokens[2].lexeme());
    }

    #[test]
    fn it_scans_builtins_and_operators() {
        let tokens = Scanner::new("(@get xs 0) (= a b) (< 1 2)".to_owned()).scan_tokens();
        assert_eq!(&TokenType::Builtin, tokens[1].token_type());
        assert_eq!("@get", tokens[1].lexeme());
        assert_eq!(&TokenType::Equal, tokens[6].token_type());
        assert_eq!(&TokenType::Less, tokens[11].token_type());
    }

    #[test]
    fn it_discards_comments_by_default() {
        assert_eq!(
            vec![
                TokenType::LeftParen,
                TokenType::Identifier,
                TokenType::RightParen,
                TokenType::Eof
            ],
            types("# a comment (with parens)\n(f) # trailing")
        );
    }

    #[test]
    fn it_can_keep_comments() {
        let tokens = Scanner::new("# note\n(f)".to_owned())
            .with_comments()
            .scan_tokens();
        assert_eq!(&TokenType::Comment, tokens[0].token_type());
        assert_eq!("# note", tokens[0].lexeme());
        assert_eq!(2, tokens[1].line());
    }

    #[test]
    fn it_turns_unknown_characters_into_error_tokens() {
        let tokens = types("(f $)");
        assert_eq!(
            TokenType::Error("unexpected character '$'".to_owned()),
            tokens[2]
        );
        assert_eq!(TokenType::RightParen, tokens[3]);
    }

    #[test]
    fn it_scans_the_same_source_identically_twice() {
        let source = "(@var (a 1) (f (@func (x) (+ x a))))\n(f 2)";
        let first = Scanner::new(source.to_owned()).scan_tokens();
        let second = Scanner::new(source.to_owned()).scan_tokens();
        assert_eq!(first, second);
    }
}
