use super::Parser;
use crate::ast::*;
use crate::diag::codes;
use crate::token::TokenKind;

impl Parser<'_> {
    /// Parse a type: a primary type followed by any number of suffix
    /// modifiers (`@` pointer, `[...]` array, `&` reference, `|` union).
    pub(crate) fn parse_type(&mut self) -> Option<TypeExpr> {
        let mut ty = self.parse_primary_type()?;
        loop {
            match self.tokens.peek().kind {
                TokenKind::At => {
                    let location = self.tokens.advance().location;
                    let qualifier = self.parse_pointer_qualifier()?;
                    ty = TypeExpr::Pointer(PointerType {
                        base: Box::new(ty),
                        qualifier,
                        location,
                    });
                }
                TokenKind::LeftBracket => {
                    let location = self.tokens.advance().location;
                    let size = if self.check(TokenKind::RightBracket) {
                        None
                    } else {
                        Some(Box::new(self.parse_expression()?))
                    };
                    self.consume(TokenKind::RightBracket, "expected ']' in array type")?;
                    ty = TypeExpr::Array(ArrayType {
                        element: Box::new(ty),
                        size,
                        location,
                    });
                }
                TokenKind::Ampersand => {
                    let location = self.tokens.advance().location;
                    ty = TypeExpr::Reference(ReferenceType {
                        base: Box::new(ty),
                        location,
                    });
                }
                TokenKind::Pipe => {
                    let location = self.tokens.advance().location;
                    let right = self.parse_type()?;
                    ty = TypeExpr::Union(UnionType {
                        left: Box::new(ty),
                        right: Box::new(right),
                        location,
                    });
                }
                _ => break,
            }
        }
        Some(ty)
    }

    /// `unsafe` and `aligned` are contextual after `@`: recognized by
    /// lexeme, not token kind.
    fn parse_pointer_qualifier(&mut self) -> Option<PointerQualifier> {
        if self.check(TokenKind::Identifier) {
            match self.tokens.peek().lexeme.as_str() {
                "unsafe" => {
                    self.tokens.advance();
                    return Some(PointerQualifier::Unsafe);
                }
                "aligned" => {
                    self.tokens.advance();
                    self.consume(TokenKind::LeftParen, "expected '(' after 'aligned'")?;
                    let number = self.consume(TokenKind::Number, "expected alignment value")?;
                    let alignment = number.lexeme.parse::<u64>().unwrap_or_else(|_| {
                        // Float literals are not alignments.
                        0
                    });
                    if alignment == 0 || !alignment.is_power_of_two() {
                        self.error_at(
                            number.location,
                            format!("alignment must be a power of two, got '{}'", number.lexeme),
                        );
                    }
                    self.consume(TokenKind::RightParen, "expected ')' after alignment")?;
                    return Some(PointerQualifier::Aligned(alignment));
                }
                _ => {}
            }
        }
        Some(PointerQualifier::Default)
    }

    fn parse_primary_type(&mut self) -> Option<TypeExpr> {
        let token = self.tokens.peek().clone();
        match token.kind {
            kind if kind.is_type_keyword() => {
                self.tokens.advance();
                Some(TypeExpr::Primitive(PrimitiveType {
                    keyword: kind,
                    location: token.location,
                }))
            }
            TokenKind::Identifier => {
                self.tokens.advance();
                // Qualified names are `ident (. ident)+`; a single
                // identifier is a named type.
                if self.check(TokenKind::Dot) {
                    let mut segments = vec![token.lexeme];
                    while self.match_kind(TokenKind::Dot) {
                        let (segment, _) =
                            self.expect_identifier("expected identifier after '.' in type")?;
                        segments.push(segment);
                    }
                    return Some(TypeExpr::Qualified(QualifiedType {
                        segments,
                        location: token.location,
                    }));
                }
                if self.check(TokenKind::Less) {
                    return self.parse_template_type(token.lexeme, token.location);
                }
                Some(TypeExpr::Named(NamedType {
                    name: token.lexeme,
                    location: token.location,
                }))
            }
            TokenKind::Function => {
                self.tokens.advance();
                self.consume(TokenKind::LeftParen, "expected '(' in function type")?;
                let mut params = Vec::new();
                if !self.check(TokenKind::RightParen) {
                    loop {
                        params.push(self.parse_type()?);
                        if !self.match_kind(TokenKind::Comma) {
                            break;
                        }
                    }
                }
                self.consume(TokenKind::RightParen, "expected ')' in function type")?;
                self.consume(TokenKind::Colon, "expected ':' before function return type")?;
                let return_type = self.parse_type()?;
                Some(TypeExpr::Function(FunctionType {
                    params,
                    return_type: Box::new(return_type),
                    location: token.location,
                }))
            }
            TokenKind::SharedAttr | TokenKind::UniqueAttr | TokenKind::WeakAttr => {
                self.tokens.advance();
                let kind = match token.kind {
                    TokenKind::SharedAttr => SmartPtrKind::Shared,
                    TokenKind::UniqueAttr => SmartPtrKind::Unique,
                    _ => SmartPtrKind::Weak,
                };
                self.consume(TokenKind::Less, "expected '<' after smart pointer keyword")?;
                let pointee = self.parse_type()?;
                self.consume(TokenKind::Greater, "expected '>' after smart pointer type")?;
                Some(TypeExpr::Smart(SmartType {
                    kind,
                    pointee: Box::new(pointee),
                    location: token.location,
                }))
            }
            _ => {
                self.reporter.error_with_code(
                    token.location,
                    format!("expected type, found '{}'", token.kind),
                    codes::PS_EXPECTED_TYPE,
                );
                None
            }
        }
    }

    fn parse_template_type(
        &mut self,
        name: String,
        location: crate::location::SourceLocation,
    ) -> Option<TypeExpr> {
        self.tokens.advance(); // '<'
        let mut arguments = Vec::new();
        loop {
            arguments.push(self.parse_type()?);
            if !self.match_kind(TokenKind::Comma) {
                break;
            }
        }
        self.consume(TokenKind::Greater, "expected '>' after template arguments")?;
        let base = TypeExpr::Named(NamedType {
            name,
            location: location.clone(),
        });
        Some(TypeExpr::Template(TemplateType {
            base: Box::new(base),
            arguments,
            location,
        }))
    }

    /// Generic parameter list: `<T, U extends Base, ...>`. The leading `<`
    /// has not been consumed.
    pub(crate) fn parse_generic_params(&mut self) -> Option<Vec<GenericParam>> {
        self.consume(TokenKind::Less, "expected '<' to open generic parameters")?;
        let mut params = Vec::new();
        loop {
            let (name, location) = self.expect_identifier("expected generic parameter name")?;
            let mut constraints = Vec::new();
            if self.match_kind(TokenKind::Extends) {
                loop {
                    constraints.push(self.parse_constraint_type()?);
                    if !self.match_kind(TokenKind::Ampersand) {
                        break;
                    }
                }
            }
            params.push(GenericParam {
                name,
                constraints,
                location,
            });
            if !self.match_kind(TokenKind::Comma) {
                break;
            }
        }
        self.consume(TokenKind::Greater, "expected '>' to close generic parameters")?;
        Some(params)
    }

    /// A constraint is a type; a bare primitive keyword in constraint
    /// position names a built-in constraint instead.
    fn parse_constraint_type(&mut self) -> Option<TypeExpr> {
        let token = self.tokens.peek().clone();
        if token.kind.is_type_keyword() {
            self.tokens.advance();
            return Some(TypeExpr::BuiltinConstraint(BuiltinConstraintType {
                name: token.lexeme,
                location: token.location,
            }));
        }
        self.parse_type()
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::*;
    use crate::parser::tests::parse_source;
    use crate::token::TokenKind;

    fn parse_ty(source: &str) -> TypeExpr {
        let (program, reporter) = parse_source(&format!("let x: {source};"));
        assert!(
            !reporter.has_errors(),
            "diagnostics for `{source}`: {:#?}",
            reporter.diagnostics()
        );
        match program.items.into_iter().next() {
            Some(Item::Decl(Decl::Var(var))) => var.ty.expect("type annotation"),
            other => panic!("expected var declaration, got {other:?}"),
        }
    }

    #[test]
    fn primitive_and_named() {
        assert!(matches!(
            parse_ty("int"),
            TypeExpr::Primitive(PrimitiveType { keyword: TokenKind::Int, .. })
        ));
        assert!(matches!(parse_ty("Widget"), TypeExpr::Named(_)));
    }

    #[test]
    fn qualified_requires_two_segments() {
        let TypeExpr::Qualified(q) = parse_ty("geometry.Point") else {
            panic!("expected qualified type");
        };
        assert_eq!(q.segments, vec!["geometry".to_string(), "Point".to_string()]);
    }

    #[test]
    fn pointer_suffixes() {
        let TypeExpr::Pointer(p) = parse_ty("int@") else {
            panic!("expected pointer");
        };
        assert_eq!(p.qualifier, PointerQualifier::Default);

        let TypeExpr::Pointer(p) = parse_ty("int@unsafe") else {
            panic!("expected pointer");
        };
        assert_eq!(p.qualifier, PointerQualifier::Unsafe);

        let TypeExpr::Pointer(p) = parse_ty("int@aligned(16)") else {
            panic!("expected pointer");
        };
        assert_eq!(p.qualifier, PointerQualifier::Aligned(16));
    }

    #[test]
    fn array_with_and_without_size() {
        let TypeExpr::Array(a) = parse_ty("float[]") else {
            panic!("expected array");
        };
        assert!(a.size.is_none());
        let TypeExpr::Array(a) = parse_ty("float[8]") else {
            panic!("expected array");
        };
        assert!(a.size.is_some());
    }

    #[test]
    fn reference_and_union() {
        assert!(matches!(parse_ty("int&"), TypeExpr::Reference(_)));
        let TypeExpr::Union(u) = parse_ty("int | string") else {
            panic!("expected union");
        };
        assert!(matches!(*u.left, TypeExpr::Primitive(_)));
    }

    #[test]
    fn suffixes_stack_left_to_right() {
        // `int@[]` is an array of pointers to int.
        let TypeExpr::Array(a) = parse_ty("int@[]") else {
            panic!("expected array");
        };
        assert!(matches!(*a.element, TypeExpr::Pointer(_)));
    }

    #[test]
    fn function_type() {
        let TypeExpr::Function(f) = parse_ty("function(int, float): bool") else {
            panic!("expected function type");
        };
        assert_eq!(f.params.len(), 2);
    }

    #[test]
    fn smart_pointer_types() {
        let TypeExpr::Smart(s) = parse_ty("#shared<Widget>") else {
            panic!("expected smart pointer");
        };
        assert_eq!(s.kind, SmartPtrKind::Shared);
        let TypeExpr::Smart(s) = parse_ty("#weak<int>") else {
            panic!("expected smart pointer");
        };
        assert_eq!(s.kind, SmartPtrKind::Weak);
    }

    #[test]
    fn template_type() {
        let TypeExpr::Template(t) = parse_ty("Box<int, Widget>") else {
            panic!("expected template type");
        };
        assert_eq!(t.arguments.len(), 2);
    }
}
