use super::Parser;
use crate::ast::*;
use crate::diag::codes;
use crate::token::TokenKind;

/// Left-associative binding power per binary operator; higher binds
/// tighter. Assignment and the ternary are handled separately because
/// they associate to the right.
fn binding_power(kind: TokenKind) -> Option<u8> {
    let bp = match kind {
        TokenKind::PipePipe => 3,
        TokenKind::AmpersandAmpersand => 4,
        TokenKind::Pipe => 5,
        TokenKind::Caret => 6,
        TokenKind::Ampersand => 7,
        TokenKind::EqualsEquals | TokenKind::ExclaimEquals => 8,
        TokenKind::Less
        | TokenKind::LessEquals
        | TokenKind::Greater
        | TokenKind::GreaterEquals => 9,
        TokenKind::LeftShift | TokenKind::RightShift => 10,
        TokenKind::Plus | TokenKind::Minus => 11,
        TokenKind::Star | TokenKind::Slash | TokenKind::Percent => 12,
        _ => return None,
    };
    Some(bp)
}

impl Parser<'_> {
    pub(crate) fn parse_expression(&mut self) -> Option<Expr> {
        self.parse_assignment()
    }

    fn parse_assignment(&mut self) -> Option<Expr> {
        let expr = self.parse_conditional()?;

        let op = self.tokens.peek().kind;
        if op.is_assignment_op() {
            let location = self.tokens.advance().location;
            let value = self.parse_assignment()?;
            return Some(Expr::Assignment(AssignmentExpr {
                op,
                target: Box::new(expr),
                value: Box::new(value),
                location,
            }));
        }
        Some(expr)
    }

    fn parse_conditional(&mut self) -> Option<Expr> {
        let condition = self.parse_binary(0)?;
        if !self.match_kind(TokenKind::Question) {
            return Some(condition);
        }
        let location = self.tokens.previous().location.clone();
        let then_expr = self.parse_expression()?;
        self.consume(TokenKind::Colon, "expected ':' in conditional expression")?;
        let else_expr = self.parse_assignment()?;
        Some(Expr::Conditional(ConditionalExpr {
            condition: Box::new(condition),
            then_expr: Box::new(then_expr),
            else_expr: Box::new(else_expr),
            location,
        }))
    }

    fn parse_binary(&mut self, min_bp: u8) -> Option<Expr> {
        let mut left = self.parse_unary()?;
        loop {
            let op = self.tokens.peek().kind;
            let Some(bp) = binding_power(op) else { break };
            if bp < min_bp {
                break;
            }
            let location = self.tokens.advance().location;
            let right = self.parse_binary(bp + 1)?;
            left = Expr::Binary(BinaryExpr {
                op,
                left: Box::new(left),
                right: Box::new(right),
                location,
            });
        }
        Some(left)
    }

    fn parse_unary(&mut self) -> Option<Expr> {
        let kind = self.tokens.peek().kind;
        match kind {
            TokenKind::Minus
            | TokenKind::Plus
            | TokenKind::Exclaim
            | TokenKind::Tilde
            | TokenKind::PlusPlus
            | TokenKind::MinusMinus
            | TokenKind::Star => {
                let location = self.tokens.advance().location;
                let operand = self.parse_unary()?;
                Some(Expr::Unary(UnaryExpr {
                    op: kind,
                    operand: Box::new(operand),
                    prefix: true,
                    location,
                }))
            }
            TokenKind::At => {
                let location = self.tokens.advance().location;
                // `@unsafe expr` takes an unsafe address; plain `@expr` a
                // safe one.
                if self.match_kind(TokenKind::UnsafeAttr) {
                    let operand = self.parse_unary()?;
                    return Some(Expr::PointerOf(PointerOfExpr {
                        operand: Box::new(operand),
                        is_unsafe: true,
                        location,
                    }));
                }
                let operand = self.parse_unary()?;
                Some(Expr::Unary(UnaryExpr {
                    op: TokenKind::At,
                    operand: Box::new(operand),
                    prefix: true,
                    location,
                }))
            }
            _ => self.parse_primary(),
        }
    }

    fn parse_primary(&mut self) -> Option<Expr> {
        let token = self.tokens.peek().clone();
        let expr = match token.kind {
            TokenKind::Number => {
                self.tokens.advance();
                Expr::Literal(LiteralExpr {
                    kind: LiteralKind::Number,
                    text: token.lexeme,
                    location: token.location,
                })
            }
            TokenKind::StringLiteral => {
                self.tokens.advance();
                Expr::Literal(LiteralExpr {
                    kind: LiteralKind::String,
                    text: token.lexeme,
                    location: token.location,
                })
            }
            TokenKind::True | TokenKind::False => {
                self.tokens.advance();
                Expr::Literal(LiteralExpr {
                    kind: LiteralKind::Bool,
                    text: token.lexeme,
                    location: token.location,
                })
            }
            TokenKind::Null => {
                self.tokens.advance();
                Expr::Literal(LiteralExpr {
                    kind: LiteralKind::Null,
                    text: token.lexeme,
                    location: token.location,
                })
            }
            TokenKind::This => {
                self.tokens.advance();
                Expr::This(token.location)
            }
            TokenKind::Identifier => {
                self.tokens.advance();
                let ident = Expr::Identifier(IdentifierExpr {
                    name: token.lexeme,
                    location: token.location,
                });
                // `f<T>(x)` only counts as a generic call when the `<`
                // hugs the callee; `a < b > (c)` keeps its whitespace and
                // stays a pair of comparisons.
                if self.check(TokenKind::Less)
                    && self.less_is_adjacent(&ident)
                    && self.scan_generic_call()
                {
                    return self.parse_generic_call(ident);
                }
                ident
            }
            TokenKind::LeftBracket => return self.parse_array_literal(),
            TokenKind::LeftParen => {
                self.tokens.advance();
                let expr = self.parse_expression()?;
                self.consume(TokenKind::RightParen, "expected ')' after expression")?;
                expr
            }
            TokenKind::New => return self.parse_new_expression(),
            TokenKind::Cast => return self.parse_cast_expression(),
            TokenKind::Function => return self.parse_function_expression(),
            TokenKind::SizeofAttr => return self.parse_compile_time(CompileTimeOp::Sizeof),
            TokenKind::AlignofAttr => return self.parse_compile_time(CompileTimeOp::Alignof),
            TokenKind::TypeofAttr => return self.parse_compile_time(CompileTimeOp::Typeof),
            TokenKind::ConstExprAttr => return self.parse_compile_time(CompileTimeOp::ConstExpr),
            _ => {
                let location = self.location();
                self.reporter.error_with_code(
                    location,
                    format!("expected expression, found '{}'", token.kind),
                    codes::PS_EXPECTED_EXPRESSION,
                );
                return None;
            }
        };
        self.parse_postfix(expr)
    }

    fn less_is_adjacent(&self, callee: &Expr) -> bool {
        let Expr::Identifier(ident) = callee else {
            return false;
        };
        let less = &self.tokens.peek().location;
        less.line == ident.location.line
            && less.column == ident.location.column + ident.name.len() as u32
    }

    /// Bounded lookahead for `ident < type-args > (`. The cursor is restored
    /// no matter what; the caller commits only on success.
    fn scan_generic_call(&mut self) -> bool {
        let saved = self.tokens.save_position();
        self.tokens.advance(); // '<'

        let mut ok = false;
        if self.peek_is_type_argument() {
            self.tokens.advance();
            loop {
                if self.check(TokenKind::Greater) {
                    self.tokens.advance();
                    ok = self.check(TokenKind::LeftParen);
                    break;
                }
                if !self.match_kind(TokenKind::Comma) {
                    break;
                }
                if !self.peek_is_type_argument() {
                    break;
                }
                self.tokens.advance();
            }
        }

        self.tokens.restore_position(saved);
        ok
    }

    fn peek_is_type_argument(&self) -> bool {
        let kind = self.tokens.peek().kind;
        kind == TokenKind::Identifier || kind.is_type_keyword()
    }

    fn parse_generic_call(&mut self, callee: Expr) -> Option<Expr> {
        let location = self.tokens.peek().location.clone();
        self.tokens.advance(); // '<'

        let mut type_arguments = Vec::new();
        loop {
            if !self.peek_is_type_argument() {
                self.error("expected type name in generic type arguments");
                return None;
            }
            type_arguments.push(self.tokens.advance().lexeme);
            if !self.match_kind(TokenKind::Comma) {
                break;
            }
        }
        self.consume(TokenKind::Greater, "expected '>' after generic type arguments")?;
        self.consume(TokenKind::LeftParen, "expected '(' after generic type arguments")?;
        let arguments = self.parse_arguments()?;

        let call = Expr::Call(CallExpr {
            callee: Box::new(callee),
            arguments,
            type_arguments,
            location,
        });
        self.parse_postfix(call)
    }

    fn parse_postfix(&mut self, mut expr: Expr) -> Option<Expr> {
        loop {
            match self.tokens.peek().kind {
                TokenKind::LeftParen => {
                    let location = self.tokens.advance().location;
                    let arguments = self.parse_arguments()?;
                    expr = Expr::Call(CallExpr {
                        callee: Box::new(expr),
                        arguments,
                        type_arguments: Vec::new(),
                        location,
                    });
                }
                TokenKind::LeftBracket => {
                    let location = self.tokens.advance().location;
                    let index = self.parse_expression()?;
                    self.consume(TokenKind::RightBracket, "expected ']' after index")?;
                    expr = Expr::Index(IndexExpr {
                        object: Box::new(expr),
                        index: Box::new(index),
                        location,
                    });
                }
                TokenKind::Dot => {
                    self.tokens.advance();
                    let (member, location) =
                        self.expect_identifier("expected property name after '.'")?;
                    expr = Expr::Member(MemberExpr {
                        object: Box::new(expr),
                        member,
                        through_pointer: false,
                        location,
                    });
                }
                TokenKind::At if self.tokens.peek_next().kind == TokenKind::Identifier => {
                    self.tokens.advance();
                    let (member, location) =
                        self.expect_identifier("expected property name after '@'")?;
                    expr = Expr::Member(MemberExpr {
                        object: Box::new(expr),
                        member,
                        through_pointer: true,
                        location,
                    });
                }
                TokenKind::PlusPlus | TokenKind::MinusMinus => {
                    let op = self.tokens.peek().kind;
                    let location = self.tokens.advance().location;
                    expr = Expr::Unary(UnaryExpr {
                        op,
                        operand: Box::new(expr),
                        prefix: false,
                        location,
                    });
                }
                _ => break,
            }
        }
        Some(expr)
    }

    /// Comma-separated arguments up to a closing `)`. The paren is consumed.
    pub(crate) fn parse_arguments(&mut self) -> Option<Vec<Expr>> {
        let mut arguments = Vec::new();
        if !self.check(TokenKind::RightParen) {
            loop {
                if arguments.len() >= 255 {
                    let location = self.location();
                    self.reporter.error_with_code(
                        location,
                        "cannot have more than 255 arguments",
                        codes::PS_TOO_MANY_ARGUMENTS,
                    );
                    return None;
                }
                arguments.push(self.parse_expression()?);
                if !self.match_kind(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.consume(TokenKind::RightParen, "expected ')' after arguments")?;
        Some(arguments)
    }

    fn parse_array_literal(&mut self) -> Option<Expr> {
        let location = self.tokens.advance().location; // '['
        let mut elements = Vec::new();
        if !self.check(TokenKind::RightBracket) {
            loop {
                elements.push(self.parse_expression()?);
                if !self.match_kind(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.consume(TokenKind::RightBracket, "expected ']' after array elements")?;
        self.parse_postfix(Expr::ArrayLiteral(ArrayLiteralExpr { elements, location }))
    }

    fn parse_new_expression(&mut self) -> Option<Expr> {
        let location = self.tokens.advance().location; // 'new'
        let (class_name, _) = self.expect_identifier("expected class name after 'new'")?;
        self.consume(TokenKind::LeftParen, "expected '(' after class name")?;
        let arguments = self.parse_arguments()?;
        self.parse_postfix(Expr::New(NewExpr {
            class_name,
            arguments,
            location,
        }))
    }

    fn parse_cast_expression(&mut self) -> Option<Expr> {
        let location = self.tokens.advance().location; // 'cast'
        self.consume(TokenKind::Less, "expected '<' after 'cast'")?;
        let target_type = self.parse_type()?;
        self.consume(TokenKind::Greater, "expected '>' after cast target type")?;
        self.consume(TokenKind::LeftParen, "expected '(' after cast target type")?;
        let expr = self.parse_expression()?;
        self.consume(TokenKind::RightParen, "expected ')' after cast operand")?;
        self.parse_postfix(Expr::Cast(CastExpr {
            target_type,
            expr: Box::new(expr),
            location,
        }))
    }

    fn parse_compile_time(&mut self, op: CompileTimeOp) -> Option<Expr> {
        let location = self.tokens.advance().location;
        self.consume(TokenKind::LeftParen, "expected '(' after compile-time operator")?;
        let operand = self.parse_expression()?;
        self.consume(TokenKind::RightParen, "expected ')' after compile-time operand")?;
        self.parse_postfix(Expr::CompileTime(CompileTimeExpr {
            op,
            operand: Box::new(operand),
            location,
        }))
    }

    fn parse_function_expression(&mut self) -> Option<Expr> {
        let location = self.tokens.advance().location; // 'function'
        self.consume(TokenKind::LeftParen, "expected '(' after 'function'")?;
        let params = self.parse_parameters()?;
        let return_type = if self.match_kind(TokenKind::Colon) {
            Some(self.parse_type()?)
        } else {
            None
        };
        let body = self.parse_block()?;
        Some(Expr::Function(FunctionExpr {
            params,
            return_type,
            body,
            location,
        }))
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::*;
    use crate::parser::tests::parse_source;
    use crate::token::TokenKind;

    fn parse_expr(source: &str) -> Expr {
        let (program, reporter) = parse_source(&format!("{source};"));
        assert!(
            !reporter.has_errors(),
            "diagnostics for `{source}`: {:#?}",
            reporter.diagnostics()
        );
        match program.items.into_iter().next() {
            Some(Item::Stmt(Stmt::Expr(stmt))) => stmt.expr,
            other => panic!("expected expression statement, got {other:?}"),
        }
    }

    #[test]
    fn multiplication_binds_tighter_than_addition() {
        let Expr::Binary(add) = parse_expr("1 + 2 * 3") else {
            panic!("expected binary");
        };
        assert_eq!(add.op, TokenKind::Plus);
        let Expr::Binary(mul) = *add.right else {
            panic!("expected nested multiply");
        };
        assert_eq!(mul.op, TokenKind::Star);
    }

    #[test]
    fn binary_operators_are_left_associative() {
        let Expr::Binary(outer) = parse_expr("1 - 2 - 3") else {
            panic!("expected binary");
        };
        assert_eq!(outer.op, TokenKind::Minus);
        assert!(matches!(*outer.left, Expr::Binary(_)));
        assert!(matches!(*outer.right, Expr::Literal(_)));
    }

    #[test]
    fn assignment_is_right_associative() {
        let Expr::Assignment(outer) = parse_expr("a = b = 1") else {
            panic!("expected assignment");
        };
        assert!(matches!(*outer.value, Expr::Assignment(_)));
    }

    #[test]
    fn shift_binds_tighter_than_comparison() {
        let Expr::Binary(cmp) = parse_expr("a << 1 < b") else {
            panic!("expected binary");
        };
        assert_eq!(cmp.op, TokenKind::Less);
        let Expr::Binary(shift) = *cmp.left else {
            panic!("expected shift on the left");
        };
        assert_eq!(shift.op, TokenKind::LeftShift);
    }

    #[test]
    fn bitwise_precedence_chain() {
        // `a | b ^ c & d` groups as `a | (b ^ (c & d))`.
        let Expr::Binary(or) = parse_expr("a | b ^ c & d") else {
            panic!("expected binary");
        };
        assert_eq!(or.op, TokenKind::Pipe);
        let Expr::Binary(xor) = *or.right else {
            panic!("expected xor");
        };
        assert_eq!(xor.op, TokenKind::Caret);
        let Expr::Binary(and) = *xor.right else {
            panic!("expected and");
        };
        assert_eq!(and.op, TokenKind::Ampersand);
    }

    #[test]
    fn ternary_nests_to_the_right() {
        let Expr::Conditional(outer) = parse_expr("a ? b : c ? d : e") else {
            panic!("expected conditional");
        };
        assert!(matches!(*outer.else_expr, Expr::Conditional(_)));
    }

    #[test]
    fn postfix_chain() {
        let Expr::Member(member) = parse_expr("a.b[1](2).c") else {
            panic!("expected member");
        };
        assert_eq!(member.member, "c");
        assert!(matches!(*member.object, Expr::Call(_)));
    }

    #[test]
    fn pointer_member_access() {
        let Expr::Member(member) = parse_expr("p@x") else {
            panic!("expected member");
        };
        assert!(member.through_pointer);
    }

    #[test]
    fn prefix_and_postfix_increment() {
        let Expr::Unary(pre) = parse_expr("++a") else {
            panic!("expected unary");
        };
        assert!(pre.prefix);
        let Expr::Unary(post) = parse_expr("a++") else {
            panic!("expected unary");
        };
        assert!(!post.prefix);
    }

    #[test]
    fn address_of_and_deref() {
        let Expr::Unary(addr) = parse_expr("@x") else {
            panic!("expected unary");
        };
        assert_eq!(addr.op, TokenKind::At);
        let Expr::Unary(deref) = parse_expr("*p") else {
            panic!("expected unary");
        };
        assert_eq!(deref.op, TokenKind::Star);
        let Expr::PointerOf(unsafe_addr) = parse_expr("@#unsafe x") else {
            panic!("expected pointer-of");
        };
        assert!(unsafe_addr.is_unsafe);
    }

    #[test]
    fn cast_and_new() {
        let Expr::Cast(cast) = parse_expr("cast<float>(1)") else {
            panic!("expected cast");
        };
        assert!(matches!(cast.target_type, TypeExpr::Primitive(_)));
        let Expr::New(new) = parse_expr("new Widget(1, 2)") else {
            panic!("expected new");
        };
        assert_eq!(new.class_name, "Widget");
        assert_eq!(new.arguments.len(), 2);
    }

    #[test]
    fn compile_time_operators() {
        let Expr::CompileTime(ct) = parse_expr("#sizeof(x)") else {
            panic!("expected compile-time expression");
        };
        assert_eq!(ct.op, CompileTimeOp::Sizeof);
    }

    #[test]
    fn generic_call_with_multiple_type_arguments() {
        let Expr::Call(call) = parse_expr("f<int, T>(1, 2)") else {
            panic!("expected call");
        };
        assert_eq!(call.type_arguments, vec!["int".to_string(), "T".to_string()]);
        assert_eq!(call.arguments.len(), 2);
    }

    #[test]
    fn lone_less_than_still_compares() {
        let Expr::Binary(cmp) = parse_expr("a < b") else {
            panic!("expected comparison");
        };
        assert_eq!(cmp.op, TokenKind::Less);
    }

    #[test]
    fn function_expression_parses() {
        let Expr::Function(func) = parse_expr("function (a: int): int { return a; }") else {
            panic!("expected function expression");
        };
        assert_eq!(func.params.len(), 1);
        assert!(func.return_type.is_some());
    }

    #[test]
    fn array_literal() {
        let Expr::ArrayLiteral(arr) = parse_expr("[1, 2, 3]") else {
            panic!("expected array literal");
        };
        assert_eq!(arr.elements.len(), 3);
    }
}
