use super::Parser;
use crate::ast::*;
use crate::diag::codes;
use crate::token::TokenKind;

impl Parser<'_> {
    pub(crate) fn parse_declaration(&mut self) -> Option<Decl> {
        let (storage, modifiers) = self.parse_leading_attributes();

        match self.tokens.peek().kind {
            TokenKind::Let => {
                self.tokens.advance();
                self.parse_var_decl(false, storage)
            }
            TokenKind::Const => {
                self.tokens.advance();
                self.parse_var_decl(true, storage)
            }
            TokenKind::Function => self.parse_function_decl(modifiers),
            TokenKind::Class => self.parse_class_decl(modifiers),
            TokenKind::Interface => {
                let zerocast = modifiers.contains(&TokenKind::ZerocastAttr);
                self.parse_interface_decl(zerocast)
            }
            TokenKind::Enum => self.parse_enum_decl(),
            TokenKind::Namespace => self.parse_namespace_decl(),
            TokenKind::Typedef => self.parse_typedef_decl(),
            TokenKind::Public | TokenKind::Private | TokenKind::Protected => {
                self.error("access modifiers are only allowed on class members");
                None
            }
            other => {
                self.error(format!("expected declaration, found '{other}'"));
                None
            }
        }
    }

    /// Storage-class and modifier attributes in front of a declaration.
    /// `#aligned` may carry a parenthesized argument, which is consumed
    /// with it.
    fn parse_leading_attributes(&mut self) -> (StorageClass, Vec<TokenKind>) {
        let mut storage = StorageClass::Auto;
        let mut modifiers = Vec::new();
        loop {
            match self.tokens.peek().kind {
                TokenKind::StackAttr => {
                    self.tokens.advance();
                    storage = StorageClass::Stack;
                }
                TokenKind::HeapAttr => {
                    self.tokens.advance();
                    storage = StorageClass::Heap;
                }
                TokenKind::StaticAttr => {
                    self.tokens.advance();
                    storage = StorageClass::Static;
                }
                kind @ (TokenKind::InlineAttr
                | TokenKind::VirtualAttr
                | TokenKind::UnsafeAttr
                | TokenKind::SimdAttr
                | TokenKind::PackedAttr
                | TokenKind::AbstractAttr
                | TokenKind::ZerocastAttr) => {
                    self.tokens.advance();
                    modifiers.push(kind);
                }
                TokenKind::AlignedAttr => {
                    self.tokens.advance();
                    modifiers.push(TokenKind::AlignedAttr);
                    if self.match_kind(TokenKind::LeftParen) {
                        let _ = self.consume(TokenKind::Number, "expected alignment value");
                        let _ = self.consume(TokenKind::RightParen, "expected ')' after alignment");
                    }
                }
                _ => break,
            }
        }
        (storage, modifiers)
    }

    fn parse_var_decl(&mut self, is_const: bool, storage: StorageClass) -> Option<Decl> {
        let (name, location) = self.expect_identifier("expected variable name")?;

        let ty = if self.match_kind(TokenKind::Colon) {
            Some(self.parse_type()?)
        } else {
            None
        };

        let initializer = if self.match_kind(TokenKind::Equals) {
            Some(self.parse_expression()?)
        } else {
            if is_const {
                self.reporter.error_with_code(
                    location.clone(),
                    "const declarations must have an initializer",
                    codes::PS_CONST_WITHOUT_INIT,
                );
                return None;
            }
            None
        };

        self.consume(TokenKind::Semicolon, "expected ';' after variable declaration")?;
        Some(Decl::Var(VarDecl {
            name,
            ty,
            initializer,
            is_const,
            storage,
            location,
        }))
    }

    fn parse_function_decl(&mut self, modifiers: Vec<TokenKind>) -> Option<Decl> {
        self.tokens.advance(); // 'function'
        let (name, location) = self.expect_identifier("expected function name")?;

        let mut generic_params = if self.check(TokenKind::Less) {
            self.parse_generic_params()?
        } else {
            Vec::new()
        };

        self.consume(TokenKind::LeftParen, "expected '(' after function name")?;
        let params = self.parse_parameters()?;

        let return_type = if self.match_kind(TokenKind::Colon) {
            Some(self.parse_type()?)
        } else {
            None
        };

        let throws = if self.match_kind(TokenKind::Throws) {
            let mut list = vec![self.parse_type()?];
            while self.match_kind(TokenKind::Comma) {
                list.push(self.parse_type()?);
            }
            list
        } else {
            Vec::new()
        };

        if self.check(TokenKind::Where) {
            self.parse_where_clauses(&mut generic_params)?;
        }

        let body = if self.match_kind(TokenKind::Semicolon) {
            None
        } else {
            Some(self.parse_block()?)
        };

        Some(Decl::Function(FunctionDecl {
            name,
            generic_params,
            params,
            return_type,
            throws,
            modifiers,
            body,
            location,
        }))
    }

    /// `where T extends A & B, U extends C` after a signature; constraints
    /// merge into the named generic parameter.
    fn parse_where_clauses(&mut self, generic_params: &mut [GenericParam]) -> Option<()> {
        self.tokens.advance(); // 'where'
        loop {
            let (name, location) = self.expect_identifier("expected generic parameter name")?;
            self.consume(TokenKind::Extends, "expected 'extends' in where clause")?;
            let mut constraints = vec![self.parse_type()?];
            while self.match_kind(TokenKind::Ampersand) {
                constraints.push(self.parse_type()?);
            }
            match generic_params.iter_mut().find(|p| p.name == name) {
                Some(param) => param.constraints.extend(constraints),
                None => self.error_at(
                    location,
                    format!("where clause names unknown generic parameter '{name}'"),
                ),
            }
            if !self.match_kind(TokenKind::Comma) {
                break;
            }
        }
        Some(())
    }

    /// Parameter list up to and including the closing `)`.
    pub(crate) fn parse_parameters(&mut self) -> Option<Vec<Param>> {
        let mut params = Vec::new();
        if !self.check(TokenKind::RightParen) {
            loop {
                params.push(self.parse_parameter()?);
                if !self.match_kind(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.consume(TokenKind::RightParen, "expected ')' after parameters")?;
        Some(params)
    }

    fn parse_parameter(&mut self) -> Option<Param> {
        let is_ref = self.match_kind(TokenKind::Ref);
        let is_const = !is_ref && self.match_kind(TokenKind::Const);
        let (name, location) = self.expect_identifier("expected parameter name")?;
        self.consume(TokenKind::Colon, "expected ':' after parameter name")?;
        let ty = self.parse_type()?;
        let default_value = if self.match_kind(TokenKind::Equals) {
            Some(self.parse_expression()?)
        } else {
            None
        };
        Some(Param {
            name,
            ty,
            default_value,
            is_ref,
            is_const,
            location,
        })
    }

    fn parse_class_decl(&mut self, modifiers: Vec<TokenKind>) -> Option<Decl> {
        self.tokens.advance(); // 'class'
        let (name, location) = self.expect_identifier("expected class name")?;

        let generic_params = if self.check(TokenKind::Less) {
            self.parse_generic_params()?
        } else {
            Vec::new()
        };

        let base_class = if self.match_kind(TokenKind::Extends) {
            Some(self.parse_type()?)
        } else {
            None
        };

        let mut interfaces = Vec::new();
        if self.match_kind(TokenKind::Implements) {
            loop {
                interfaces.push(self.parse_type()?);
                if !self.match_kind(TokenKind::Comma) {
                    break;
                }
            }
        }

        self.consume(TokenKind::LeftBrace, "expected '{' to open class body")?;
        let mut members = Vec::new();
        while !self.check(TokenKind::RightBrace) && !self.tokens.is_at_end() {
            match self.parse_class_member() {
                Some(member) => members.push(member),
                None => {
                    self.synchronize();
                    if self.check(TokenKind::RightBrace) {
                        break;
                    }
                }
            }
        }
        self.consume(TokenKind::RightBrace, "expected '}' after class body")?;

        Some(Decl::Class(ClassDecl {
            name,
            generic_params,
            base_class,
            interfaces,
            modifiers,
            members,
            location,
        }))
    }

    fn parse_access_modifier(&mut self) -> AccessModifier {
        match self.tokens.peek().kind {
            TokenKind::Public => {
                self.tokens.advance();
                AccessModifier::Public
            }
            TokenKind::Private => {
                self.tokens.advance();
                AccessModifier::Private
            }
            TokenKind::Protected => {
                self.tokens.advance();
                AccessModifier::Protected
            }
            _ => AccessModifier::Public,
        }
    }

    fn parse_class_member(&mut self) -> Option<ClassMember> {
        let access = self.parse_access_modifier();

        // `get` and `set` are contextual: they introduce a property only
        // when a member name follows.
        if self.check(TokenKind::Get) && self.tokens.peek_next().kind == TokenKind::Identifier {
            return self.parse_getter(access);
        }
        if self.check(TokenKind::Set) && self.tokens.peek_next().kind == TokenKind::Identifier {
            return self.parse_setter(access);
        }

        if self.check(TokenKind::Constructor) {
            let location = self.tokens.advance().location;
            self.consume(TokenKind::LeftParen, "expected '(' after 'constructor'")?;
            let params = self.parse_parameters()?;
            let body = if self.match_kind(TokenKind::Semicolon) {
                None
            } else {
                Some(self.parse_block()?)
            };
            return Some(ClassMember::Constructor(ConstructorDecl {
                params,
                access,
                body,
                location,
            }));
        }

        let mut modifiers = Vec::new();
        while matches!(
            self.tokens.peek().kind,
            TokenKind::InlineAttr | TokenKind::VirtualAttr | TokenKind::UnsafeAttr | TokenKind::SimdAttr
        ) {
            modifiers.push(self.tokens.advance().kind);
        }

        let is_const = self.match_kind(TokenKind::Const);
        let (name, location) = self.expect_identifier("expected member name")?;

        if self.match_kind(TokenKind::LeftParen) {
            let params = self.parse_parameters()?;
            let return_type = if self.match_kind(TokenKind::Colon) {
                Some(self.parse_type()?)
            } else {
                None
            };
            let body = if self.match_kind(TokenKind::Semicolon) {
                None
            } else {
                Some(self.parse_block()?)
            };
            return Some(ClassMember::Method(MethodDecl {
                name,
                params,
                return_type,
                access,
                modifiers,
                body,
                location,
            }));
        }

        let ty = if self.match_kind(TokenKind::Colon) {
            Some(self.parse_type()?)
        } else {
            None
        };
        let initializer = if self.match_kind(TokenKind::Equals) {
            Some(self.parse_expression()?)
        } else {
            None
        };
        self.consume(TokenKind::Semicolon, "expected ';' after field declaration")?;
        Some(ClassMember::Field(FieldDecl {
            name,
            ty,
            initializer,
            is_const,
            access,
            location,
        }))
    }

    fn parse_getter(&mut self, access: AccessModifier) -> Option<ClassMember> {
        self.tokens.advance(); // 'get'
        let (name, location) = self.expect_identifier("expected property name after 'get'")?;
        self.consume(TokenKind::Colon, "expected ':' after getter name")?;
        let ty = self.parse_type()?;
        let body = Some(self.parse_block()?);
        Some(ClassMember::Property(PropertyDecl {
            name,
            kind: PropertyKind::Get,
            ty,
            param: None,
            access,
            body,
            location,
        }))
    }

    fn parse_setter(&mut self, access: AccessModifier) -> Option<ClassMember> {
        self.tokens.advance(); // 'set'
        let (name, location) = self.expect_identifier("expected property name after 'set'")?;
        self.consume(TokenKind::LeftParen, "expected '(' after setter name")?;
        let param = self.parse_parameter()?;
        self.consume(TokenKind::RightParen, "expected ')' after setter parameter")?;
        let ty = param.ty.clone();
        let body = Some(self.parse_block()?);
        Some(ClassMember::Property(PropertyDecl {
            name,
            kind: PropertyKind::Set,
            ty,
            param: Some(param),
            access,
            body,
            location,
        }))
    }

    fn parse_interface_decl(&mut self, is_zerocast: bool) -> Option<Decl> {
        self.tokens.advance(); // 'interface'
        let (name, location) = self.expect_identifier("expected interface name")?;

        let generic_params = if self.check(TokenKind::Less) {
            self.parse_generic_params()?
        } else {
            Vec::new()
        };

        let mut extends = Vec::new();
        if self.match_kind(TokenKind::Extends) {
            loop {
                extends.push(self.parse_type()?);
                if !self.match_kind(TokenKind::Comma) {
                    break;
                }
            }
        }

        self.consume(TokenKind::LeftBrace, "expected '{' to open interface body")?;
        let mut members = Vec::new();
        while !self.check(TokenKind::RightBrace) && !self.tokens.is_at_end() {
            match self.parse_interface_member() {
                Some(member) => members.push(member),
                None => {
                    self.synchronize();
                    if self.check(TokenKind::RightBrace) {
                        break;
                    }
                }
            }
        }
        self.consume(TokenKind::RightBrace, "expected '}' after interface body")?;

        Some(Decl::Interface(InterfaceDecl {
            name,
            generic_params,
            extends,
            is_zerocast,
            members,
            location,
        }))
    }

    fn parse_interface_member(&mut self) -> Option<InterfaceMember> {
        // Accessor-restricted property signatures: `get name: T;` or
        // `set name: T;`. A bare `name: T;` allows both.
        let mut has_getter = true;
        let mut has_setter = true;
        if self.check(TokenKind::Get) && self.tokens.peek_next().kind == TokenKind::Identifier {
            self.tokens.advance();
            has_setter = false;
        } else if self.check(TokenKind::Set) && self.tokens.peek_next().kind == TokenKind::Identifier
        {
            self.tokens.advance();
            has_getter = false;
        }

        let (name, location) = self.expect_identifier("expected interface member name")?;

        if self.match_kind(TokenKind::LeftParen) {
            let params = self.parse_parameters()?;
            self.consume(TokenKind::Colon, "expected ':' before method return type")?;
            let return_type = self.parse_type()?;
            self.consume(TokenKind::Semicolon, "expected ';' after method signature")?;
            return Some(InterfaceMember::Method(MethodSignature {
                name,
                params,
                return_type,
                location,
            }));
        }

        self.consume(TokenKind::Colon, "expected ':' after property name")?;
        let ty = self.parse_type()?;
        self.consume(TokenKind::Semicolon, "expected ';' after property signature")?;
        Some(InterfaceMember::Property(PropertySignature {
            name,
            ty,
            has_getter,
            has_setter,
            location,
        }))
    }

    fn parse_enum_decl(&mut self) -> Option<Decl> {
        self.tokens.advance(); // 'enum'
        let (name, location) = self.expect_identifier("expected enum name")?;

        let underlying_type = if self.match_kind(TokenKind::Colon) {
            Some(self.parse_type()?)
        } else {
            None
        };

        self.consume(TokenKind::LeftBrace, "expected '{' to open enum body")?;
        let mut members = Vec::new();
        while !self.check(TokenKind::RightBrace) && !self.tokens.is_at_end() {
            let (member_name, member_loc) = self.expect_identifier("expected enum member name")?;
            let value = if self.match_kind(TokenKind::Equals) {
                Some(self.parse_expression()?)
            } else {
                None
            };
            members.push(EnumMember {
                name: member_name,
                value,
                location: member_loc,
            });
            if !self.match_kind(TokenKind::Comma) {
                break;
            }
        }
        self.consume(TokenKind::RightBrace, "expected '}' after enum body")?;

        Some(Decl::Enum(EnumDecl {
            name,
            underlying_type,
            members,
            location,
        }))
    }

    fn parse_namespace_decl(&mut self) -> Option<Decl> {
        self.tokens.advance(); // 'namespace'
        let (name, location) = self.expect_identifier("expected namespace name")?;
        self.consume(TokenKind::LeftBrace, "expected '{' to open namespace body")?;

        let mut declarations = Vec::new();
        while !self.check(TokenKind::RightBrace) && !self.tokens.is_at_end() {
            match self.parse_declaration() {
                Some(decl) => declarations.push(decl),
                None => {
                    self.synchronize();
                    if self.check(TokenKind::RightBrace) {
                        break;
                    }
                }
            }
        }
        self.consume(TokenKind::RightBrace, "expected '}' after namespace body")?;

        Some(Decl::Namespace(NamespaceDecl {
            name,
            declarations,
            location,
        }))
    }

    fn parse_typedef_decl(&mut self) -> Option<Decl> {
        self.tokens.advance(); // 'typedef'
        let (name, location) = self.expect_identifier("expected typedef name")?;
        self.consume(TokenKind::Equals, "expected '=' in typedef")?;
        let aliased = self.parse_type()?;
        self.consume(TokenKind::Semicolon, "expected ';' after typedef")?;
        Some(Decl::Typedef(TypedefDecl {
            name,
            aliased,
            location,
        }))
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::*;
    use crate::parser::tests::parse_source;
    use crate::token::TokenKind;

    fn parse_decl(source: &str) -> Decl {
        let (program, reporter) = parse_source(source);
        assert!(
            !reporter.has_errors(),
            "diagnostics for `{source}`: {:#?}",
            reporter.diagnostics()
        );
        match program.items.into_iter().next() {
            Some(Item::Decl(decl)) => decl,
            other => panic!("expected declaration, got {other:?}"),
        }
    }

    #[test]
    fn var_decl_with_storage_class() {
        let Decl::Var(var) = parse_decl("#static let counter: int = 0;") else {
            panic!("expected var");
        };
        assert_eq!(var.storage, StorageClass::Static);
        assert!(!var.is_const);
    }

    #[test]
    fn const_without_initializer_is_rejected() {
        let (_, reporter) = parse_source("const x: int;");
        assert!(reporter.has_errors());
    }

    #[test]
    fn function_with_everything() {
        let Decl::Function(f) = parse_decl(
            "#inline function max<T extends Comparable>(a: T, b: T): T throws RangeError { return a; }",
        ) else {
            panic!("expected function");
        };
        assert!(f.is_generic());
        assert_eq!(f.generic_params[0].constraints.len(), 1);
        assert_eq!(f.params.len(), 2);
        assert_eq!(f.throws.len(), 1);
        assert_eq!(f.modifiers, vec![TokenKind::InlineAttr]);
        assert!(f.body.is_some());
    }

    #[test]
    fn function_where_clause_merges_constraints() {
        let Decl::Function(f) =
            parse_decl("function f<T>(x: T): T where T extends Numeric { return x; }")
        else {
            panic!("expected function");
        };
        assert_eq!(f.generic_params[0].constraints.len(), 1);
    }

    #[test]
    fn ref_and_default_parameters() {
        let Decl::Function(f) = parse_decl("function f(ref out: int, n: int = 3): void { }")
        else {
            panic!("expected function");
        };
        assert!(f.params[0].is_ref);
        assert!(f.params[1].default_value.is_some());
    }

    #[test]
    fn class_with_members() {
        let Decl::Class(c) = parse_decl(
            "class Rect extends Shape implements Area, Debug {
                private _width: float = 0.0;
                constructor(w: float) { }
                area(): float { return 0.0; }
                get width: float { return 0.0; }
                set width(value: float) { }
            }",
        ) else {
            panic!("expected class");
        };
        assert!(c.base_class.is_some());
        assert_eq!(c.interfaces.len(), 2);
        assert_eq!(c.members.len(), 5);
        assert!(matches!(
            &c.members[0],
            ClassMember::Field(f) if f.access == AccessModifier::Private
        ));
        assert!(matches!(&c.members[1], ClassMember::Constructor(_)));
        assert!(matches!(&c.members[2], ClassMember::Method(_)));
        assert!(matches!(
            &c.members[3],
            ClassMember::Property(p) if p.kind == PropertyKind::Get
        ));
        assert!(matches!(
            &c.members[4],
            ClassMember::Property(p) if p.kind == PropertyKind::Set && p.param.is_some()
        ));
    }

    #[test]
    fn generic_class() {
        let Decl::Class(c) = parse_decl("class Box<T> { value: T; }") else {
            panic!("expected class");
        };
        assert!(c.is_generic());
    }

    #[test]
    fn interface_with_signatures() {
        let Decl::Interface(i) = parse_decl(
            "#zerocast interface Shape extends Drawable {
                area(): float;
                name: string;
                get id: int;
            }",
        ) else {
            panic!("expected interface");
        };
        assert!(i.is_zerocast);
        assert_eq!(i.extends.len(), 1);
        assert_eq!(i.members.len(), 3);
        assert!(matches!(
            &i.members[2],
            InterfaceMember::Property(p) if p.has_getter && !p.has_setter
        ));
    }

    #[test]
    fn enum_with_values_and_underlying_type() {
        let Decl::Enum(e) = parse_decl("enum Color: int { Red = 1, Green, Blue = 4 }") else {
            panic!("expected enum");
        };
        assert!(e.underlying_type.is_some());
        assert_eq!(e.members.len(), 3);
        assert!(e.members[1].value.is_none());
    }

    #[test]
    fn namespace_nests_declarations() {
        let Decl::Namespace(n) = parse_decl(
            "namespace geometry { const pi: float = 3.14; function area(r: float): float { return pi * r * r; } }",
        ) else {
            panic!("expected namespace");
        };
        assert_eq!(n.declarations.len(), 2);
    }

    #[test]
    fn typedef_aliases_a_type() {
        let Decl::Typedef(t) = parse_decl("typedef Ints = int[];") else {
            panic!("expected typedef");
        };
        assert!(matches!(t.aliased, TypeExpr::Array(_)));
    }

    #[test]
    fn method_signature_without_body() {
        let Decl::Function(f) = parse_decl("function putc(c: int): void;") else {
            panic!("expected function");
        };
        assert!(f.body.is_none());
    }
}
