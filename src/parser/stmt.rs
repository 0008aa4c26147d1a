use super::Parser;
use crate::ast::*;
use crate::token::TokenKind;

impl Parser<'_> {
    pub(crate) fn parse_statement(&mut self) -> Option<Stmt> {
        // `label: stmt` — an identifier immediately followed by a colon.
        if self.check(TokenKind::Identifier) && self.tokens.peek_next().kind == TokenKind::Colon {
            let token = self.tokens.advance();
            self.tokens.advance(); // ':'
            let statement = self.parse_statement()?;
            return Some(Stmt::Labeled(LabeledStmt {
                label: token.lexeme,
                statement: Box::new(statement),
                location: token.location,
            }));
        }

        if self.tokens.peek().kind.starts_declaration() {
            let location = self.location();
            let decl = self.parse_declaration()?;
            return Some(Stmt::Decl(DeclStmt { decl, location }));
        }

        match self.tokens.peek().kind {
            TokenKind::LeftBrace => self.parse_block().map(Stmt::Block),
            TokenKind::If => self.parse_if(),
            TokenKind::While => self.parse_while(),
            TokenKind::Do => self.parse_do_while(),
            TokenKind::For => self.parse_for(),
            TokenKind::Switch => self.parse_switch(),
            TokenKind::Try => self.parse_try(),
            TokenKind::Return => self.parse_return(),
            TokenKind::Break => {
                let location = self.tokens.advance().location;
                self.consume(TokenKind::Semicolon, "expected ';' after 'break'")?;
                Some(Stmt::Break(location))
            }
            TokenKind::Continue => {
                let location = self.tokens.advance().location;
                self.consume(TokenKind::Semicolon, "expected ';' after 'continue'")?;
                Some(Stmt::Continue(location))
            }
            TokenKind::Throw => {
                let location = self.tokens.advance().location;
                let value = self.parse_expression()?;
                self.consume(TokenKind::Semicolon, "expected ';' after throw value")?;
                Some(Stmt::Throw(ThrowStmt { value, location }))
            }
            TokenKind::AsmAttr => self.parse_assembly(),
            _ => {
                let location = self.location();
                let expr = self.parse_expression()?;
                self.consume(TokenKind::Semicolon, "expected ';' after expression")?;
                Some(Stmt::Expr(ExprStmt { expr, location }))
            }
        }
    }

    /// `{ stmt* }` with per-statement recovery: a bad statement does not
    /// abandon the rest of the block.
    pub(crate) fn parse_block(&mut self) -> Option<Block> {
        let open = self.consume(TokenKind::LeftBrace, "expected '{'")?;
        let mut statements = Vec::new();
        while !self.check(TokenKind::RightBrace) && !self.tokens.is_at_end() {
            match self.parse_statement() {
                Some(stmt) => statements.push(stmt),
                None => {
                    self.synchronize();
                    if self.check(TokenKind::RightBrace) || self.tokens.is_at_end() {
                        break;
                    }
                }
            }
        }
        self.consume(TokenKind::RightBrace, "expected '}' after block")?;
        Some(Block {
            statements,
            location: open.location,
        })
    }

    fn parse_if(&mut self) -> Option<Stmt> {
        let location = self.tokens.advance().location; // 'if'
        self.consume(TokenKind::LeftParen, "expected '(' after 'if'")?;
        let condition = self.parse_expression()?;
        self.consume(TokenKind::RightParen, "expected ')' after if condition")?;
        let then_branch = Box::new(self.parse_statement()?);
        let else_branch = if self.match_kind(TokenKind::Else) {
            Some(Box::new(self.parse_statement()?))
        } else {
            None
        };
        Some(Stmt::If(IfStmt {
            condition,
            then_branch,
            else_branch,
            location,
        }))
    }

    fn parse_while(&mut self) -> Option<Stmt> {
        let location = self.tokens.advance().location; // 'while'
        self.consume(TokenKind::LeftParen, "expected '(' after 'while'")?;
        let condition = self.parse_expression()?;
        self.consume(TokenKind::RightParen, "expected ')' after while condition")?;
        let body = Box::new(self.parse_statement()?);
        Some(Stmt::While(WhileStmt {
            condition,
            body,
            location,
        }))
    }

    fn parse_do_while(&mut self) -> Option<Stmt> {
        let location = self.tokens.advance().location; // 'do'
        let body = Box::new(self.parse_statement()?);
        self.consume(TokenKind::While, "expected 'while' after do body")?;
        self.consume(TokenKind::LeftParen, "expected '(' after 'while'")?;
        let condition = self.parse_expression()?;
        self.consume(TokenKind::RightParen, "expected ')' after do-while condition")?;
        self.consume(TokenKind::Semicolon, "expected ';' after do-while")?;
        Some(Stmt::DoWhile(DoWhileStmt {
            body,
            condition,
            location,
        }))
    }

    /// `for (...)` splits three ways on what follows the `(`:
    /// a `let`/`const` binding that continues with `of` (for-of), the same
    /// binding with `=` (classical), or a plain initializer expression.
    fn parse_for(&mut self) -> Option<Stmt> {
        let location = self.tokens.advance().location; // 'for'
        self.consume(TokenKind::LeftParen, "expected '(' after 'for'")?;

        if self.check(TokenKind::Let) || self.check(TokenKind::Const) {
            let binding_is_const = self.tokens.advance().kind == TokenKind::Const;
            let (binding, binding_loc) = self.expect_identifier("expected loop variable name")?;
            let binding_type = if self.match_kind(TokenKind::Colon) {
                Some(self.parse_type()?)
            } else {
                None
            };

            if self.match_kind(TokenKind::Of) {
                let iterable = self.parse_expression()?;
                self.consume(TokenKind::RightParen, "expected ')' after for-of iterable")?;
                let body = Box::new(self.parse_statement()?);
                return Some(Stmt::ForOf(ForOfStmt {
                    binding,
                    binding_is_const,
                    binding_type,
                    iterable,
                    body,
                    location,
                }));
            }

            let initializer = if self.match_kind(TokenKind::Equals) {
                Some(self.parse_expression()?)
            } else {
                None
            };
            self.consume(TokenKind::Semicolon, "expected ';' after for initializer")?;
            let init_stmt = Stmt::Decl(DeclStmt {
                decl: Decl::Var(VarDecl {
                    name: binding,
                    ty: binding_type,
                    initializer,
                    is_const: binding_is_const,
                    storage: StorageClass::Auto,
                    location: binding_loc.clone(),
                }),
                location: binding_loc,
            });
            return self.finish_for(location, Some(Box::new(init_stmt)));
        }

        let initializer = if self.match_kind(TokenKind::Semicolon) {
            None
        } else {
            let init_loc = self.location();
            let expr = self.parse_expression()?;
            self.consume(TokenKind::Semicolon, "expected ';' after for initializer")?;
            Some(Box::new(Stmt::Expr(ExprStmt {
                expr,
                location: init_loc,
            })))
        };
        self.finish_for(location, initializer)
    }

    fn finish_for(
        &mut self,
        location: crate::location::SourceLocation,
        initializer: Option<Box<Stmt>>,
    ) -> Option<Stmt> {
        let condition = if self.check(TokenKind::Semicolon) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.consume(TokenKind::Semicolon, "expected ';' after for condition")?;
        let increment = if self.check(TokenKind::RightParen) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.consume(TokenKind::RightParen, "expected ')' after for clauses")?;
        let body = Box::new(self.parse_statement()?);
        Some(Stmt::For(ForStmt {
            initializer,
            condition,
            increment,
            body,
            location,
        }))
    }

    fn parse_switch(&mut self) -> Option<Stmt> {
        let location = self.tokens.advance().location; // 'switch'
        self.consume(TokenKind::LeftParen, "expected '(' after 'switch'")?;
        let scrutinee = self.parse_expression()?;
        self.consume(TokenKind::RightParen, "expected ')' after switch expression")?;
        self.consume(TokenKind::LeftBrace, "expected '{' to open switch body")?;

        let mut cases = Vec::new();
        while !self.check(TokenKind::RightBrace) && !self.tokens.is_at_end() {
            if self.match_kind(TokenKind::Case) {
                let case_loc = self.tokens.previous().location.clone();
                let value = self.parse_expression()?;
                self.consume(TokenKind::Colon, "expected ':' after case value")?;
                let body = self.parse_case_body();
                cases.push(SwitchCase {
                    value: Some(value),
                    body,
                    location: case_loc,
                });
            } else if self.match_kind(TokenKind::Default) {
                let case_loc = self.tokens.previous().location.clone();
                self.consume(TokenKind::Colon, "expected ':' after 'default'")?;
                let body = self.parse_case_body();
                cases.push(SwitchCase {
                    value: None,
                    body,
                    location: case_loc,
                });
            } else {
                self.error("expected 'case' or 'default' in switch body");
                return None;
            }
        }
        self.consume(TokenKind::RightBrace, "expected '}' after switch body")?;
        Some(Stmt::Switch(SwitchStmt {
            scrutinee,
            cases,
            location,
        }))
    }

    fn parse_case_body(&mut self) -> Vec<Stmt> {
        let mut body = Vec::new();
        while !self.check(TokenKind::Case)
            && !self.check(TokenKind::Default)
            && !self.check(TokenKind::RightBrace)
            && !self.tokens.is_at_end()
        {
            match self.parse_statement() {
                Some(stmt) => body.push(stmt),
                None => {
                    self.synchronize();
                    break;
                }
            }
        }
        body
    }

    fn parse_try(&mut self) -> Option<Stmt> {
        let location = self.tokens.advance().location; // 'try'
        let try_block = self.parse_block()?;

        let mut catch_clauses = Vec::new();
        while self.check(TokenKind::Catch) {
            let catch_loc = self.tokens.advance().location;
            self.consume(TokenKind::LeftParen, "expected '(' after 'catch'")?;
            let (param, _) = self.expect_identifier("expected catch parameter name")?;
            let param_type = if self.match_kind(TokenKind::Colon) {
                Some(self.parse_type()?)
            } else {
                None
            };
            self.consume(TokenKind::RightParen, "expected ')' after catch parameter")?;
            let body = self.parse_block()?;
            catch_clauses.push(CatchClause {
                param,
                param_type,
                body,
                location: catch_loc,
            });
        }

        let finally_block = if self.match_kind(TokenKind::Finally) {
            Some(self.parse_block()?)
        } else {
            None
        };

        if catch_clauses.is_empty() && finally_block.is_none() {
            self.error_at(location.clone(), "try statement needs a catch or finally block");
        }
        Some(Stmt::Try(TryStmt {
            try_block,
            catch_clauses,
            finally_block,
            location,
        }))
    }

    fn parse_return(&mut self) -> Option<Stmt> {
        let location = self.tokens.advance().location; // 'return'
        let value = if self.check(TokenKind::Semicolon) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.consume(TokenKind::Semicolon, "expected ';' after return statement")?;
        Some(Stmt::Return(ReturnStmt { value, location }))
    }

    /// `#asm("...")` — the payload string is carried verbatim to lowering.
    fn parse_assembly(&mut self) -> Option<Stmt> {
        let location = self.tokens.advance().location; // '#asm'
        self.consume(TokenKind::LeftParen, "expected '(' after '#asm'")?;
        let code = self.consume(TokenKind::StringLiteral, "expected assembly string")?;
        self.consume(TokenKind::RightParen, "expected ')' after assembly string")?;
        self.consume(TokenKind::Semicolon, "expected ';' after assembly statement")?;
        Some(Stmt::Assembly(AssemblyStmt {
            code: code.lexeme,
            location,
        }))
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::*;
    use crate::parser::tests::parse_source;

    fn parse_stmt(source: &str) -> Stmt {
        let (program, reporter) = parse_source(source);
        assert!(
            !reporter.has_errors(),
            "diagnostics for `{source}`: {:#?}",
            reporter.diagnostics()
        );
        match program.items.into_iter().next() {
            Some(Item::Stmt(stmt)) => stmt,
            other => panic!("expected statement, got {other:?}"),
        }
    }

    #[test]
    fn if_else_chain() {
        let Stmt::If(stmt) = parse_stmt("if (a) { } else if (b) { } else { }") else {
            panic!("expected if");
        };
        assert!(matches!(*stmt.else_branch.unwrap(), Stmt::If(_)));
    }

    #[test]
    fn while_and_do_while() {
        assert!(matches!(parse_stmt("while (a) { }"), Stmt::While(_)));
        assert!(matches!(parse_stmt("do { } while (a);"), Stmt::DoWhile(_)));
    }

    #[test]
    fn classical_for_with_binding() {
        let Stmt::For(stmt) = parse_stmt("for (let i = 0; i < 10; i++) { }") else {
            panic!("expected for");
        };
        assert!(stmt.initializer.is_some());
        assert!(stmt.condition.is_some());
        assert!(stmt.increment.is_some());
    }

    #[test]
    fn for_with_empty_clauses() {
        let Stmt::For(stmt) = parse_stmt("for (;;) { }") else {
            panic!("expected for");
        };
        assert!(stmt.initializer.is_none());
        assert!(stmt.condition.is_none());
        assert!(stmt.increment.is_none());
    }

    #[test]
    fn for_of_binds_a_name() {
        let Stmt::ForOf(stmt) = parse_stmt("for (let e of [1, 2, 3]) { }") else {
            panic!("expected for-of");
        };
        assert_eq!(stmt.binding, "e");
        assert!(!stmt.binding_is_const);
    }

    #[test]
    fn for_of_with_const_and_type() {
        let Stmt::ForOf(stmt) = parse_stmt("for (const e: int of xs) { }") else {
            panic!("expected for-of");
        };
        assert!(stmt.binding_is_const);
        assert!(stmt.binding_type.is_some());
    }

    #[test]
    fn switch_with_cases_and_default() {
        let Stmt::Switch(stmt) = parse_stmt(
            "switch (x) { case 1: f(); break; case 2: g(); break; default: h(); }",
        ) else {
            panic!("expected switch");
        };
        assert_eq!(stmt.cases.len(), 3);
        assert!(stmt.cases[2].is_default());
        assert_eq!(stmt.cases[0].body.len(), 2);
    }

    #[test]
    fn try_catch_finally() {
        let Stmt::Try(stmt) =
            parse_stmt("try { f(); } catch (e: string) { g(); } finally { h(); }")
        else {
            panic!("expected try");
        };
        assert_eq!(stmt.catch_clauses.len(), 1);
        assert!(stmt.catch_clauses[0].param_type.is_some());
        assert!(stmt.finally_block.is_some());
    }

    #[test]
    fn labeled_statement() {
        let Stmt::Labeled(stmt) = parse_stmt("outer: while (a) { }") else {
            panic!("expected labeled statement");
        };
        assert_eq!(stmt.label, "outer");
        assert!(matches!(*stmt.statement, Stmt::While(_)));
    }

    #[test]
    fn assembly_statement_keeps_payload() {
        let Stmt::Assembly(stmt) = parse_stmt(r#"#asm("printf(\"hi\\n\")");"#) else {
            panic!("expected assembly");
        };
        assert!(stmt.code.contains("printf"));
    }

    #[test]
    fn throw_statement() {
        assert!(matches!(parse_stmt("throw err;"), Stmt::Throw(_)));
    }
}
