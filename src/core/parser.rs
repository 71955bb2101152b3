use std::cell::Cell;
use std::mem::discriminant;
use std::result;
use std::sync::Arc;

use super::{Form, FuncLiteral, Node, Program, RefKind, Reference, Token, TokenType};

/// A parsed node and whether it, or anything below it, is malformed.
type Parsed = (Node, bool);

/// Parses a series of Tokens into an abstract syntax tree.
///
/// Every form is parenthesised, and the token after the opening paren picks
/// the rule:
///
/// ```notrust
/// program     → statement* EOF ;
/// statement   → import | export | expression ;
/// import      → "(" "@import" ( "(" IDENTIFIER STRING ")" )* ")" ;
/// export      → "(" "@export" IDENTIFIER* ")" ;
///
/// expression  → "(" form ")" | literal | reference ;
/// form        → "@var" ( "(" IDENTIFIER expression ")" )*
///             | "@func" "(" IDENTIFIER* ")" ( "(" expression* ")" | call )
///             | "@list" expression*
///             | "@hash" ( "(" STRING expression ")" )*
///             | "@match" expression ( "(" "@when" expression expression ")" )+
///             | "@seq" expression*
///             | "@chain" expression+
///             | "@async" expression*
///             | reference expression* ;
/// reference   → IDENTIFIER ( "." IDENTIFIER )? | BUILTIN | OPERATOR ;
/// literal     → STRING | NUMBER | BOOLEAN ;
/// ```
///
/// Rules never abort the parse. A rule that can't build its node returns a
/// `Node::Malformed` in its place and sets the error flag; the flag bubbles
/// up through the enclosing rules while their siblings keep parsing.
pub struct Parser {
    tokens: Vec<Token>,
    /// Use interior mutability here to avoid forcing the user to hold a
    /// mutable Parser.
    cursor: Cell<usize>,
}

impl Parser {
    /// Creates a parser over `tokens`. Comment tokens are dropped.
    #[must_use]
    pub fn new(tokens: Vec<Token>) -> Self {
        Parser {
            tokens: tokens
                .into_iter()
                .filter(|t| t.token_type != TokenType::Comment)
                .collect(),
            cursor: Cell::new(0),
        }
    }

    /// Parses the whole token stream. The flag is set when any statement
    /// contains a malformed node.
    #[tracing::instrument(level = "trace", skip_all)]
    pub fn parse(self) -> (Program, bool) {
        let mut program = Program::default();
        let mut had_errors = false;

        while !self.is_at_end() {
            let start = self.cursor.get();
            let (statement, had_error) = self.statement();
            if had_error {
                tracing::warn!(%statement, "recovered from a malformed statement");
                had_errors = true;
                self.synchronize(start);
            }

            program.body.push(statement);
        }

        tracing::debug!(statements = program.body.len(), had_errors, "parsed program");
        (program, had_errors)
    }

    fn statement(&self) -> Parsed {
        if self.check(TokenType::LeftParen) {
            let head = self.peek_at(1);
            if head.token_type == TokenType::Builtin {
                match Form::from_keyword(&head.lexeme) {
                    Some(Form::Import) => {
                        self.advance();
                        self.advance();
                        return self.import_statement();
                    }
                    Some(Form::Export) => {
                        self.advance();
                        self.advance();
                        return self.export_statement();
                    }
                    _ => {}
                }
            }

            return self.expression();
        }

        let failing_at = self.advance();
        let message = format!("unexpected token in statement at line {}", failing_at.line);
        (Node::malformed(Some(failing_at), message), true)
    }

    /// Skips ahead until the parentheses opened since `start` are balanced,
    /// so the next statement starts on a fresh form.
    fn synchronize(&self, start: usize) {
        let mut depth = self.tokens[start..self.cursor.get()]
            .iter()
            .fold(0_i64, |depth, token| depth + Parser::paren_delta(token));

        while depth > 0 && !self.is_at_end() {
            depth += Parser::paren_delta(&self.advance());
        }
    }

    fn paren_delta(token: &Token) -> i64 {
        match token.token_type {
            TokenType::LeftParen => 1,
            TokenType::RightParen => -1,
            _ => 0,
        }
    }

    fn expression(&self) -> Parsed {
        if !self.match_token(TokenType::LeftParen) {
            return self.simple_literal();
        }

        let head = self.advance();
        match &head.token_type {
            TokenType::Builtin => match Form::from_keyword(&head.lexeme) {
                Some(Form::Var) => self.var_statement(),
                Some(Form::Func) => self.func_literal(),
                Some(Form::List) => {
                    self.recover(|| {
                        let (elements, had_error) = self.expressions("expected ) at end of list")?;
                        Ok((Node::List(elements), had_error))
                    })
                }
                Some(Form::Hash) => self.hash_literal(),
                Some(Form::Match) => self.match_expression(),
                Some(Form::Seq) => self.recover(|| {
                    let (exprs, had_error) = self.expressions("expected end of seq")?;
                    Ok((Node::Seq(exprs), had_error))
                }),
                Some(Form::Chain) => self.chain_expression(),
                Some(Form::Async) => self.recover(|| {
                    let (exprs, had_error) = self.expressions("expected end of async")?;
                    Ok((Node::Async(Arc::new(exprs)), had_error))
                }),
                Some(form @ (Form::Import | Form::Export | Form::When)) => {
                    let message = match form {
                        Form::When => "@when is only allowed inside @match",
                        _ => "imports and exports are only allowed at the top level",
                    };
                    (Node::malformed(Some(head), message), true)
                }
                None => {
                    self.revert();
                    self.call_expression()
                }
            },
            TokenType::Identifier => {
                self.revert();
                self.call_expression()
            }
            t if t.is_operator() => {
                self.revert();
                self.call_expression()
            }
            _ => (
                Node::malformed(Some(head), "unexpected token in expression"),
                true,
            ),
        }
    }

    fn simple_literal(&self) -> Parsed {
        let token = self.advance();
        match &token.token_type {
            TokenType::String(s) => (Node::String(s.clone()), false),
            TokenType::Number(n) => (Node::Integer(*n), false),
            TokenType::Boolean(b) => (Node::Boolean(*b), false),
            TokenType::Identifier => {
                self.revert();
                self.reference()
            }
            TokenType::Builtin if Form::from_keyword(&token.lexeme).is_none() => (
                Node::Reference(Reference::new(token.lexeme.as_ref(), RefKind::Builtin)),
                false,
            ),
            TokenType::Error(message) => {
                let message = message.clone();
                (Node::malformed(Some(token), message), true)
            }
            _ => (
                Node::malformed(Some(token), "unexpected token in expression"),
                true,
            ),
        }
    }

    // STATEMENTS

    fn import_statement(&self) -> Parsed {
        self.recover(|| {
            let mut imports: Vec<(String, String)> = Vec::new();
            let mut duplicate = None;

            while !self.check(TokenType::RightParen) && !self.is_at_end() {
                self.consume(TokenType::LeftParen, "expected import pair")?;
                let alias = self.consume(TokenType::Identifier, "expected module alias")?;
                let path = self.consume(TokenType::String(String::new()), "expected module path")?;
                self.consume(
                    TokenType::RightParen,
                    "malformed import pair: missing closing )",
                )?;

                if imports.iter().any(|(a, _)| **a == *alias.lexeme) {
                    if duplicate.is_none() {
                        duplicate = Some(Node::malformed(Some(alias), "duplicated import alias"));
                    }
                    continue;
                }

                imports.push((alias.lexeme.to_string(), Parser::string_literal(&path)));
            }

            self.consume(
                TokenType::RightParen,
                "expected closing ) for import statement",
            )?;

            match duplicate {
                Some(malformed) => Ok((malformed, true)),
                None => Ok((Node::Import(imports), false)),
            }
        })
    }

    fn export_statement(&self) -> Parsed {
        self.recover(|| {
            let mut exports = Vec::new();

            while !self.check(TokenType::RightParen) && !self.is_at_end() {
                let name = self.consume(TokenType::Identifier, "unexpected token in exports list")?;
                exports.push(Reference::new(name.lexeme.as_ref(), RefKind::Declared));
            }

            self.consume(
                TokenType::RightParen,
                "expected closing ) for export statement",
            )?;
            Ok((Node::Export(exports), false))
        })
    }

    fn var_statement(&self) -> Parsed {
        self.recover(|| {
            let mut vars: Vec<(String, Node)> = Vec::new();
            let mut had_errors = false;

            while !self.check(TokenType::RightParen) && !self.is_at_end() {
                self.consume(TokenType::LeftParen, "expected variable pair")?;
                let name = self.consume(TokenType::Identifier, "expected variable name")?;
                let (value, had_error) = self.expression();
                had_errors |= had_error;
                self.consume(
                    TokenType::RightParen,
                    "malformed variable pair: missing closing )",
                )?;

                if vars.iter().any(|(n, _)| **n == *name.lexeme) {
                    had_errors = true;
                    let lexeme = name.lexeme.to_string();
                    vars.push((
                        lexeme,
                        Node::malformed(Some(name), "duplicated variable name"),
                    ));
                } else {
                    vars.push((name.lexeme.to_string(), value));
                }
            }

            self.consume(TokenType::RightParen, "expected closing ) for var statement")?;
            Ok((Node::Var(vars), had_errors))
        })
    }

    // EXPRESSIONS

    fn call_expression(&self) -> Parsed {
        self.recover(|| {
            let (callee, callee_error) = self.reference();
            let (args, args_error) = self.expressions("expected ) in call expression")?;
            Ok((
                Node::Call(Box::new(callee), args),
                callee_error || args_error,
            ))
        })
    }

    fn reference(&self) -> Parsed {
        let first = self.advance();
        match &first.token_type {
            t if t.is_operator() => (
                Node::Reference(Reference::new(first.lexeme.as_ref(), RefKind::Builtin)),
                false,
            ),
            TokenType::Builtin => (
                Node::Reference(Reference::new(first.lexeme.as_ref(), RefKind::Builtin)),
                false,
            ),
            TokenType::Identifier => {
                if !self.match_token(TokenType::Dot) {
                    return (
                        Node::Reference(Reference::new(first.lexeme.as_ref(), RefKind::Declared)),
                        false,
                    );
                }

                self.recover(|| {
                    let second = self.consume(
                        TokenType::Identifier,
                        "malformed reference to imported value",
                    )?;
                    let name = format!("{}.{}", first.lexeme, second.lexeme);
                    Ok((
                        Node::Reference(Reference::new(name, RefKind::Imported)),
                        false,
                    ))
                })
            }
            _ => (
                Node::malformed(Some(first), "unexpected token in reference"),
                true,
            ),
        }
    }

    /// `(@func (params...) (body...))`. A body that opens with an operator
    /// symbol is a single call: `(@func (x) (+ x 1))`.
    fn func_literal(&self) -> Parsed {
        self.recover(|| {
            self.consume(
                TokenType::LeftParen,
                "expected params list for func declaration",
            )?;

            let mut parameters = Vec::new();
            let mut bad_parameter = None;
            while !self.check(TokenType::RightParen) && !self.is_at_end() {
                match self.consume(TokenType::Identifier, "expected param name") {
                    Ok(name) => parameters.push(name.lexeme.to_string()),
                    Err(malformed) => {
                        bad_parameter.get_or_insert(malformed);
                    }
                }
            }

            self.consume(
                TokenType::RightParen,
                "expected ) at the end of params list",
            )?;
            self.consume(TokenType::LeftParen, "expected body for func declaration")?;

            let (body, had_error) = if self.peek().token_type.is_operator() {
                self.revert();
                let (call, had_error) = self.expression();
                (vec![call], had_error)
            } else {
                self.expressions("expected ) at the end of func body")?
            };

            self.consume(TokenType::RightParen, "expected end of func declaration")?;

            if let Some(malformed) = bad_parameter {
                return Ok((malformed, true));
            }

            Ok((
                Node::Func(Arc::new(FuncLiteral { parameters, body })),
                had_error,
            ))
        })
    }

    fn match_expression(&self) -> Parsed {
        self.recover(|| {
            let (condition, mut had_errors) = self.expression();
            let mut cases = Vec::new();

            while !self.check(TokenType::RightParen) && !self.is_at_end() {
                self.consume(TokenType::LeftParen, "expected start of when clause")?;
                let when = self.consume(TokenType::Builtin, "expected @when")?;
                if Form::from_keyword(&when.lexeme) != Some(Form::When) {
                    return Err(Node::malformed(Some(when), "expected @when"));
                }

                let (expected, expected_error) = self.expression();
                let (action, action_error) = self.expression();
                had_errors |= expected_error || action_error;

                self.consume(TokenType::RightParen, "expected end of when clause")?;
                cases.push((expected, action));
            }

            let close = self.consume(TokenType::RightParen, "expected end of match expression")?;
            if cases.is_empty() {
                return Err(Node::malformed(
                    Some(close),
                    "match expects at least one @when clause",
                ));
            }

            Ok((Node::Match(Box::new(condition), cases), had_errors))
        })
    }

    fn chain_expression(&self) -> Parsed {
        self.recover(|| {
            let (exprs, had_error) = self.expressions("expected end of chain")?;
            if exprs.is_empty() {
                return Err(Node::malformed(
                    None,
                    "chain expects at least one inner expression",
                ));
            }

            Ok((Node::Chain(Arc::new(exprs)), had_error))
        })
    }

    // LITERALS

    /// Duplicate keys are an error, but the literal stays usable: the last
    /// value written for a key wins and the key keeps its first position.
    fn hash_literal(&self) -> Parsed {
        self.recover(|| {
            let mut store: Vec<(String, Node)> = Vec::new();
            let mut had_errors = false;

            while !self.check(TokenType::RightParen) && !self.is_at_end() {
                self.consume(TokenType::LeftParen, "expected key value pair")?;
                let key = self.consume(TokenType::String(String::new()), "key must be a string")?;
                let (value, had_error) = self.expression();
                had_errors |= had_error;
                self.consume(TokenType::RightParen, "expected end of key value pair")?;

                let key = Parser::string_literal(&key);
                match store.iter_mut().find(|(k, _)| *k == key) {
                    Some(entry) => {
                        tracing::warn!(%key, "duplicate key in hash literal");
                        had_errors = true;
                        entry.1 = value;
                    }
                    None => store.push((key, value)),
                }
            }

            self.consume(TokenType::RightParen, "expected end of hash literal")?;
            Ok((Node::Hash(store), had_errors))
        })
    }

    // PARSER HELPERS

    /// Runs a rule whose structural failures short circuit with `?`.
    fn recover<F>(&self, rule: F) -> Parsed
    where
        F: FnOnce() -> result::Result<Parsed, Node>,
    {
        rule().unwrap_or_else(|malformed| (malformed, true))
    }

    /// Parses expressions up to and including the closing paren of the
    /// enclosing form.
    fn expressions(&self, unclosed: &str) -> result::Result<(Vec<Node>, bool), Node> {
        let mut exprs = Vec::new();
        let mut had_errors = false;

        while !self.check(TokenType::RightParen) && !self.is_at_end() {
            let (expr, had_error) = self.expression();
            had_errors |= had_error;
            exprs.push(expr);
        }

        self.consume(TokenType::RightParen, unclosed)?;
        Ok((exprs, had_errors))
    }

    fn string_literal(token: &Token) -> String {
        match &token.token_type {
            TokenType::String(s) => s.clone(),
            _ => token.lexeme.to_string(),
        }
    }

    /// Consumes the next token if it has the expected type. Otherwise
    /// returns a malformed node describing the mismatch; the offending token
    /// is skipped unless it closes a form.
    fn consume(&self, expected: TokenType, message: &str) -> result::Result<Token, Node> {
        if self.check(expected) {
            return Ok(self.advance());
        }

        let actual = self.peek();
        if actual.token_type != TokenType::RightParen {
            self.advance();
        }

        let message = format!("parser: {} at line {}", message, actual.line);
        Err(Node::malformed(Some(actual), message))
    }

    fn match_token(&self, token_type: TokenType) -> bool {
        if !self.check(token_type) {
            return false;
        }

        self.advance();
        true
    }

    fn check(&self, token_type: TokenType) -> bool {
        if self.is_at_end() {
            return false;
        }

        discriminant(&self.peek().token_type) == discriminant(&token_type)
    }

    fn is_at_end(&self) -> bool {
        self.tokens
            .get(self.cursor.get())
            .map_or(true, |t| t.token_type == TokenType::Eof)
    }

    fn peek(&self) -> Token {
        self.peek_at(0)
    }

    /// The token `offset` places ahead, clamped to the last token.
    fn peek_at(&self, offset: usize) -> Token {
        self.tokens
            .get(self.cursor.get() + offset)
            .or_else(|| self.tokens.last())
            .cloned()
            .unwrap_or_else(|| Token::new(TokenType::Eof, String::new(), 0))
    }

    fn advance(&self) -> Token {
        let token = self.peek();
        if !self.is_at_end() {
            self.cursor.set(self.cursor.get() + 1);
        }

        token
    }

    /// Steps back over the token `advance` just returned.
    fn revert(&self) {
        let cursor = self.cursor.get();
        if cursor > 0 {
            self.cursor.set(cursor - 1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::Scanner;
    use super::*;

    fn parse(source: &str) -> (Program, bool) {
        Parser::new(Scanner::new(source.to_owned()).scan_tokens()).parse()
    }

    fn declared(name: &str) -> Node {
        Node::Reference(Reference::new(name, RefKind::Declared))
    }

    fn builtin(name: &str) -> Node {
        Node::Reference(Reference::new(name, RefKind::Builtin))
    }

    #[test]
    fn it_can_advance_and_revert_over_tokens() {
        let parser = Parser::new(Scanner::new("(f)".to_owned()).scan_tokens());

        assert_eq!(TokenType::LeftParen, parser.advance().token_type);
        assert_eq!(TokenType::Identifier, parser.advance().token_type);
        parser.revert();
        assert_eq!(TokenType::Identifier, parser.advance().token_type);
        assert_eq!(TokenType::RightParen, parser.advance().token_type);
        // advancing past the end keeps returning end-of-file
        assert_eq!(TokenType::Eof, parser.advance().token_type);
        assert_eq!(TokenType::Eof, parser.advance().token_type);
    }

    #[test]
    fn it_can_parse_literals_in_a_list() {
        let (program, had_errors) = parse("(@list \"a\" 1 true)");

        assert!(!had_errors);
        assert_eq!(
            vec![Node::List(vec![
                Node::String("a".to_owned()),
                Node::Integer(1),
                Node::Boolean(true)
            ])],
            program.body
        );
    }

    #[test]
    fn it_can_parse_a_var_statement_in_order() {
        let (program, had_errors) = parse("(@var (b 2) (a b))");

        assert!(!had_errors);
        assert_eq!(
            vec![Node::Var(vec![
                ("b".to_owned(), Node::Integer(2)),
                ("a".to_owned(), declared("b"))
            ])],
            program.body
        );
    }

    #[test]
    fn it_distinguishes_reference_kinds() {
        let (program, had_errors) = parse("(stdio.print (@len xs) @len)");

        assert!(!had_errors);
        assert_eq!(
            vec![Node::Call(
                Box::new(Node::Reference(Reference::new(
                    "stdio.print",
                    RefKind::Imported
                ))),
                vec![
                    Node::Call(Box::new(builtin("@len")), vec![declared("xs")]),
                    builtin("@len"),
                ]
            )],
            program.body
        );
    }

    #[test]
    fn it_parses_operators_as_builtin_callees() {
        let (program, had_errors) = parse("(= a 1) (+ 1 2)");

        assert!(!had_errors);
        assert_eq!(
            Node::Call(Box::new(builtin("=")), vec![declared("a"), Node::Integer(1)]),
            program.body[0]
        );
        assert_eq!(
            Node::Call(
                Box::new(builtin("+")),
                vec![Node::Integer(1), Node::Integer(2)]
            ),
            program.body[1]
        );
    }

    #[test]
    fn it_can_parse_a_function_with_a_body_list() {
        let (program, had_errors) = parse("(@func (a b) ((f a) b))");

        assert!(!had_errors);
        assert_eq!(
            vec![Node::Func(Arc::new(FuncLiteral {
                parameters: vec!["a".to_owned(), "b".to_owned()],
                body: vec![
                    Node::Call(Box::new(declared("f")), vec![declared("a")]),
                    declared("b"),
                ],
            }))],
            program.body
        );
    }

    #[test]
    fn it_reads_an_operator_body_as_a_single_call() {
        let (program, had_errors) = parse("(@func (x) (* x 2))");

        assert!(!had_errors);
        assert_eq!(
            vec![Node::Func(Arc::new(FuncLiteral {
                parameters: vec!["x".to_owned()],
                body: vec![Node::Call(
                    Box::new(builtin("*")),
                    vec![declared("x"), Node::Integer(2)]
                )],
            }))],
            program.body
        );
    }

    #[test]
    fn it_can_parse_a_match_expression() {
        let (program, had_errors) =
            parse("(@match x (@when 1 \"one\") (@when (> value 1) \"many\"))");

        assert!(!had_errors);
        match &program.body[0] {
            Node::Match(condition, cases) => {
                assert_eq!(&declared("x"), condition.as_ref());
                assert_eq!(2, cases.len());
                assert_eq!(Node::Integer(1), cases[0].0);
                assert_eq!(Node::String("many".to_owned()), cases[1].1);
            }
            other => panic!("expected a match, got {}", other),
        }
    }

    #[test]
    fn it_requires_at_least_one_when_clause() {
        let (program, had_errors) = parse("(@match x)");

        assert!(had_errors);
        assert!(program.body[0].is_malformed());
    }

    #[test]
    fn it_flags_duplicate_hash_keys_and_keeps_the_last_value() {
        let (program, had_errors) = parse("(@hash (\"k\" 1) (\"j\" 3) (\"k\" 2))");

        assert!(had_errors);
        assert_eq!(
            vec![Node::Hash(vec![
                ("k".to_owned(), Node::Integer(2)),
                ("j".to_owned(), Node::Integer(3)),
            ])],
            program.body
        );
    }

    #[test]
    fn it_flags_duplicate_variable_names() {
        let (program, had_errors) = parse("(@var (a 1) (a 2) (b 3))");

        assert!(had_errors);
        match &program.body[0] {
            Node::Var(pairs) => {
                assert_eq!(3, pairs.len());
                assert!(pairs[1].1.is_malformed());
                assert_eq!(("b".to_owned(), Node::Integer(3)), pairs[2]);
            }
            other => panic!("expected a var statement, got {}", other),
        }
    }

    #[test]
    fn it_flags_duplicate_import_aliases() {
        let (program, had_errors) = parse("(@import (m \"a.toy\") (m \"b.toy\")) (f)");

        assert!(had_errors);
        assert!(program.body[0].is_malformed());
        assert_eq!(
            Node::Call(Box::new(declared("f")), Vec::new()),
            program.body[1]
        );
    }

    #[test]
    fn it_can_parse_imports_and_exports() {
        let (program, had_errors) =
            parse("(@import (stdio \"stdio\") (m \"lib/m.toy\")) (@export a b)");

        assert!(!had_errors);
        assert_eq!(
            Node::Import(vec![
                ("stdio".to_owned(), "stdio".to_owned()),
                ("m".to_owned(), "lib/m.toy".to_owned())
            ]),
            program.body[0]
        );
        assert_eq!(
            Node::Export(vec![
                Reference::new("a", RefKind::Declared),
                Reference::new("b", RefKind::Declared)
            ]),
            program.body[1]
        );
        assert_eq!(1, program.export_count());
    }

    #[test]
    fn it_rejects_an_empty_chain() {
        let (program, had_errors) = parse("(@chain)");

        assert!(had_errors);
        assert!(program.body[0].is_malformed());
    }

    #[test]
    fn it_recovers_at_the_next_statement() {
        let (program, had_errors) = parse("42 (@var (a 1) 2)\n(g)");

        assert!(had_errors);
        assert_eq!(3, program.body.len());
        assert!(program.body[0].is_malformed());
        assert!(program.body[1].is_malformed());
        assert_eq!(
            Node::Call(Box::new(declared("g")), Vec::new()),
            program.body[2]
        );
    }

    #[test]
    fn it_keeps_parsing_siblings_after_a_bad_sub_expression() {
        let (program, had_errors) = parse("(@list 1 (@when 2 3) 4)");

        assert!(had_errors);
        match &program.body[0] {
            Node::List(elements) => {
                assert_eq!(Node::Integer(1), elements[0]);
                assert!(elements[1].is_malformed());
            }
            other => panic!("expected a list, got {}", other),
        }
    }

    #[test]
    fn it_surfaces_scanner_errors_as_malformed_nodes() {
        let (program, had_errors) = parse("(f $)");

        assert!(had_errors);
        match &program.body[0] {
            Node::Call(_, args) => assert!(args[0].is_malformed()),
            other => panic!("expected a call, got {}", other),
        }
        assert!(program.to_string().contains("unexpected character '$'"));
    }

    #[test]
    fn it_rejects_imports_below_the_top_level() {
        let (program, had_errors) = parse("(@seq (@import (m \"m.toy\")))");

        assert!(had_errors);
        assert!(program.to_string().contains("only allowed at the top level"));
    }

    #[test]
    fn it_dumps_a_program() {
        let (program, _) = parse("(@var (xs (@list 1 \"a\")))\n(stdio.print xs)");

        assert_eq!(
            concat!(
                "(program\n",
                "  (var (xs (list 1 \"a\")))\n",
                "  (call <imported stdio.print> <declared xs>)\n",
                ")",
            ),
            program.to_string()
        );
    }
}
