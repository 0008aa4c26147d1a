mod decl;
mod expr;
mod stmt;
mod ty;

use crate::ast::{Item, Program};
use crate::diag::{codes, Reporter};
use crate::location::SourceLocation;
use crate::stream::TokenStream;
use crate::token::{Token, TokenKind};

/// Parse a token sequence into a program.
///
/// Always returns a program: on a parse failure the parser reports a
/// diagnostic, resynchronizes at the next statement boundary, and keeps
/// going. The caller decides whether errors gate the later phases.
pub fn parse(tokens: Vec<Token>, reporter: &mut Reporter) -> Program {
    let mut parser = Parser {
        tokens: TokenStream::new(tokens),
        reporter,
    };
    parser.parse_program()
}

pub(crate) struct Parser<'r> {
    pub(crate) tokens: TokenStream,
    pub(crate) reporter: &'r mut Reporter,
}

impl Parser<'_> {
    fn parse_program(&mut self) -> Program {
        let mut items = Vec::new();
        while !self.tokens.is_at_end() {
            let parsed = if self.tokens.peek().kind.starts_declaration() {
                self.parse_declaration().map(Item::Decl)
            } else {
                self.parse_statement().map(Item::Stmt)
            };
            match parsed {
                Some(item) => items.push(item),
                None => self.synchronize(),
            }
        }
        Program { items }
    }

    // -----------------------------------------------------------------
    // Shared helpers
    // -----------------------------------------------------------------

    pub(crate) fn check(&self, kind: TokenKind) -> bool {
        self.tokens.check(kind)
    }

    pub(crate) fn match_kind(&mut self, kind: TokenKind) -> bool {
        self.tokens.match_kind(kind)
    }

    /// Consume a token of the given kind or report `message` and fail.
    pub(crate) fn consume(&mut self, kind: TokenKind, message: &str) -> Option<Token> {
        if self.check(kind) {
            Some(self.tokens.advance())
        } else {
            self.error(message);
            None
        }
    }

    pub(crate) fn expect_identifier(&mut self, message: &str) -> Option<(String, SourceLocation)> {
        if self.check(TokenKind::Identifier) {
            let token = self.tokens.advance();
            Some((token.lexeme, token.location))
        } else {
            self.error(message);
            None
        }
    }

    pub(crate) fn location(&self) -> SourceLocation {
        self.tokens.peek().location.clone()
    }

    pub(crate) fn error(&mut self, message: impl Into<String>) {
        let location = self.location();
        self.reporter
            .error_with_code(location, message, codes::PS_UNEXPECTED_TOKEN);
    }

    pub(crate) fn error_at(&mut self, location: SourceLocation, message: impl Into<String>) {
        self.reporter
            .error_with_code(location, message, codes::PS_UNEXPECTED_TOKEN);
    }

    /// Skip ahead to the token after the next `;`, or to a token that can
    /// begin a fresh statement or declaration.
    pub(crate) fn synchronize(&mut self) {
        self.tokens.advance();
        while !self.tokens.is_at_end() {
            if self.tokens.previous().kind == TokenKind::Semicolon {
                return;
            }
            match self.tokens.peek().kind {
                TokenKind::Class
                | TokenKind::Function
                | TokenKind::Let
                | TokenKind::Const
                | TokenKind::If
                | TokenKind::While
                | TokenKind::Return
                | TokenKind::LeftBrace
                | TokenKind::RightBrace => return,
                _ => {
                    self.tokens.advance();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Decl, Expr, Stmt};
    use crate::lexer;

    pub(crate) fn parse_source(source: &str) -> (Program, Reporter) {
        let mut reporter = Reporter::new();
        let tokens = lexer::lex(source, "t.tsl", &mut reporter);
        let program = parse(tokens, &mut reporter);
        (program, reporter)
    }

    fn parse_ok(source: &str) -> Program {
        let (program, reporter) = parse_source(source);
        assert!(
            !reporter.has_errors(),
            "unexpected diagnostics: {:#?}",
            reporter.diagnostics()
        );
        program
    }

    #[test]
    fn empty_input_is_an_empty_program() {
        let program = parse_ok("");
        assert!(program.items.is_empty());
    }

    #[test]
    fn top_level_mixes_declarations_and_statements() {
        let program = parse_ok("let x: int = 1; x + 2; function f(): void {}");
        assert_eq!(program.items.len(), 3);
        assert!(matches!(program.items[0], Item::Decl(Decl::Var(_))));
        assert!(matches!(program.items[1], Item::Stmt(Stmt::Expr(_))));
        assert!(matches!(program.items[2], Item::Decl(Decl::Function(_))));
    }

    #[test]
    fn every_node_carries_a_location() {
        let program = parse_ok("let x = 1; if (x) { x = 2; }");
        for item in &program.items {
            let loc = item.location();
            assert!(loc.line >= 1 && loc.column >= 1);
        }
    }

    #[test]
    fn recovers_after_a_bad_statement() {
        let (program, reporter) = parse_source("let = ;\nlet y: int = 2;");
        assert!(reporter.has_errors());
        // The second declaration survives recovery.
        assert!(program
            .items
            .iter()
            .any(|i| matches!(i, Item::Decl(Decl::Var(v)) if v.name == "y")));
    }

    #[test]
    fn recovers_inside_blocks() {
        let (program, reporter) = parse_source("function f(): void { let = 1; let ok = 2; }");
        assert!(reporter.has_errors());
        let Item::Decl(Decl::Function(f)) = &program.items[0] else {
            panic!("expected function");
        };
        let body = f.body.as_ref().unwrap();
        assert!(body.statements.iter().any(|s| matches!(
            s,
            Stmt::Decl(d) if matches!(&d.decl, Decl::Var(v) if v.name == "ok")
        )));
    }

    #[test]
    fn generic_call_versus_comparison() {
        // `a < b > (c)` must parse as two comparisons, not a generic call.
        let program = parse_ok("a < b > (c);");
        let Item::Stmt(Stmt::Expr(stmt)) = &program.items[0] else {
            panic!("expected expression statement");
        };
        let Expr::Binary(outer) = &stmt.expr else {
            panic!("expected binary expression, got {:?}", stmt.expr);
        };
        assert_eq!(outer.op, TokenKind::Greater);

        // `f<T>(c)` is a call with one type argument and one value argument.
        let program = parse_ok("f<T>(c);");
        let Item::Stmt(Stmt::Expr(stmt)) = &program.items[0] else {
            panic!("expected expression statement");
        };
        let Expr::Call(call) = &stmt.expr else {
            panic!("expected call expression, got {:?}", stmt.expr);
        };
        assert_eq!(call.type_arguments, vec!["T".to_string()]);
        assert_eq!(call.arguments.len(), 1);
    }
}
