mod decl;
mod expr;
mod stmt;

use std::collections::HashMap;
use std::rc::Rc;

use crate::ast::{Decl, Item, Program, TypeExpr};
use crate::diag::{codes, DiagCode, Reporter};
use crate::location::SourceLocation;
use crate::scope::Scope;
use crate::token::TokenKind;
use crate::types::Type;

/// Type-check a program.
///
/// Returns `false` iff the reporter accumulated at least one new error.
/// The AST is never mutated; all results flow through the reporter and the
/// returned flag.
pub fn check(program: &Program, reporter: &mut Reporter) -> bool {
    let errors_before = reporter.error_count();
    let mut checker = Checker::new(reporter);
    checker.check_program(program);
    checker.reporter.error_count() == errors_before
}

/// Member tables for one class or interface: what `obj.member` can reach.
#[derive(Debug, Default)]
pub(crate) struct ClassInfo {
    pub fields: HashMap<String, Rc<Type>>,
    pub methods: HashMap<String, Rc<Type>>,
    pub properties: HashMap<String, Rc<Type>>,
    pub constructor: Option<Rc<Type>>,
}

impl ClassInfo {
    pub fn member(&self, name: &str) -> Option<Rc<Type>> {
        self.fields
            .get(name)
            .or_else(|| self.properties.get(name))
            .or_else(|| self.methods.get(name))
            .cloned()
    }
}

/// What a namespace exported, for `ns.member` and `ns.Type` resolution.
#[derive(Debug, Default)]
pub(crate) struct NamespaceInfo {
    pub variables: HashMap<String, Rc<Type>>,
    pub functions: HashMap<String, Rc<Type>>,
    pub types: HashMap<String, Rc<Type>>,
}

pub(crate) struct Checker<'r> {
    pub(crate) reporter: &'r mut Reporter,
    pub(crate) scope: Scope,
    pub(crate) in_loop: bool,
    pub(crate) in_try: bool,
    /// Declared return type of the function currently being checked.
    pub(crate) return_type: Option<Rc<Type>>,
    /// Type of the enclosing class while checking its members.
    pub(crate) class_type: Option<Rc<Type>>,
    pub(crate) classes: HashMap<String, ClassInfo>,
    pub(crate) namespaces: HashMap<String, NamespaceInfo>,
    pub(crate) enums: HashMap<String, HashMap<String, Rc<Type>>>,
}

impl<'r> Checker<'r> {
    fn new(reporter: &'r mut Reporter) -> Self {
        Checker {
            reporter,
            scope: Scope::with_builtins(),
            in_loop: false,
            in_try: false,
            return_type: None,
            class_type: None,
            classes: HashMap::new(),
            namespaces: HashMap::new(),
            enums: HashMap::new(),
        }
    }

    fn check_program(&mut self, program: &Program) {
        // Pass 1: bring every top-level type declaration into the root
        // scope so definitions may reference each other in any order.
        for item in &program.items {
            if let Item::Decl(decl) = item {
                match decl {
                    Decl::Class(class) => {
                        self.scope.declare_type(&class.name, Type::named(&class.name));
                    }
                    Decl::Interface(interface) => {
                        self.scope
                            .declare_type(&interface.name, Type::named(&interface.name));
                    }
                    Decl::Enum(en) => {
                        self.scope.declare_type(&en.name, Type::named(&en.name));
                    }
                    Decl::Typedef(typedef) => {
                        let aliased = self.resolve_type(&typedef.aliased);
                        self.scope.declare_type(&typedef.name, aliased);
                    }
                    _ => {}
                }
            }
        }

        // Pass 2: check every definition and statement in source order.
        for item in &program.items {
            match item {
                Item::Decl(decl) => {
                    self.check_decl(decl);
                }
                Item::Stmt(stmt) => {
                    self.check_stmt(stmt);
                }
            }
        }
    }

    // -----------------------------------------------------------------
    // Shared helpers
    // -----------------------------------------------------------------

    pub(crate) fn error(&mut self, location: &SourceLocation, message: impl Into<String>, code: DiagCode) {
        self.reporter.error_with_code(location.clone(), message, code);
    }

    pub(crate) fn warning(&mut self, location: &SourceLocation, message: impl Into<String>) {
        self.reporter.warning(location.clone(), message);
    }

    pub(crate) fn enter_function_scope(&mut self, return_type: Rc<Type>) -> Option<Rc<Type>> {
        self.scope.enter();
        self.return_type.replace(return_type)
    }

    pub(crate) fn exit_function_scope(&mut self, previous: Option<Rc<Type>>) {
        self.return_type = previous;
        self.scope.exit();
    }

    pub(crate) fn check_assignment_compatibility(
        &mut self,
        target: &Rc<Type>,
        value: &Rc<Type>,
        location: &SourceLocation,
    ) -> bool {
        if value.is_assignable_to(target) {
            return true;
        }
        self.error(
            location,
            format!("cannot assign {value} to {target}"),
            codes::TC_INVALID_CONVERSION,
        );
        false
    }

    /// Inferred variable types forget literal-zero-ness: `let n = 0;`
    /// makes an ordinary int, not a null-pointer constant.
    pub(crate) fn normalize_inferred(ty: Rc<Type>) -> Rc<Type> {
        if ty.is_literal_zero() {
            Type::int()
        } else {
            ty
        }
    }

    // -----------------------------------------------------------------
    // Type resolution
    // -----------------------------------------------------------------

    pub(crate) fn resolve_type(&mut self, ty: &TypeExpr) -> Rc<Type> {
        match ty {
            TypeExpr::Primitive(p) => match p.keyword {
                TokenKind::Void => Type::void(),
                TokenKind::Int => Type::int(),
                TokenKind::Float => Type::float(),
                TokenKind::Boolean => Type::bool(),
                TokenKind::String => Type::string(),
                _ => {
                    self.error(&p.location, "unknown primitive type", codes::TC_UNDEFINED_TYPE);
                    Type::error()
                }
            },
            TypeExpr::Named(n) => match self.scope.lookup_type(&n.name) {
                Some(found) => found,
                None => {
                    self.error(
                        &n.location,
                        format!("undefined type: {}", n.name),
                        codes::TC_UNDEFINED_TYPE,
                    );
                    Type::error()
                }
            },
            TypeExpr::Qualified(q) => self.resolve_qualified(&q.segments, &q.location),
            TypeExpr::Array(a) => {
                let element = self.resolve_type(&a.element);
                if let Some(size) = &a.size {
                    let size_ty = self.check_expr(size);
                    if !size_ty.is_assignable_to(&Type::int()) {
                        self.error(
                            size.location(),
                            "array size must be an integer",
                            codes::TC_INVALID_CONVERSION,
                        );
                    }
                }
                Type::array(element)
            }
            TypeExpr::Pointer(p) => {
                let pointee = self.resolve_type(&p.base);
                let is_unsafe = matches!(p.qualifier, crate::ast::PointerQualifier::Unsafe);
                Type::pointer(pointee, is_unsafe)
            }
            TypeExpr::Reference(r) => {
                let target = self.resolve_type(&r.base);
                Type::reference(target)
            }
            TypeExpr::Function(f) => {
                let ret = self.resolve_type(&f.return_type);
                let params = f.params.iter().map(|p| self.resolve_type(p)).collect();
                Type::function(ret, params)
            }
            TypeExpr::Template(t) => {
                let base = self.resolve_type(&t.base);
                let args = t.arguments.iter().map(|a| self.resolve_type(a)).collect();
                match &*base {
                    Type::Named(name) => Type::template(name.clone(), args),
                    Type::Error => Type::error(),
                    _ => {
                        self.error(
                            t.base.location(),
                            "template base type must be a named type",
                            codes::TC_UNDEFINED_TYPE,
                        );
                        Type::error()
                    }
                }
            }
            TypeExpr::Smart(s) => {
                let pointee = self.resolve_type(&s.pointee);
                let kind = match s.kind {
                    crate::ast::SmartPtrKind::Shared => crate::types::SmartKind::Shared,
                    crate::ast::SmartPtrKind::Unique => crate::types::SmartKind::Unique,
                    crate::ast::SmartPtrKind::Weak => crate::types::SmartKind::Weak,
                };
                Type::smart(pointee, kind)
            }
            TypeExpr::Union(u) => {
                let left = self.resolve_type(&u.left);
                let right = self.resolve_type(&u.right);
                Type::union(left, right)
            }
            TypeExpr::BuiltinConstraint(b) => Type::named(&b.name),
        }
    }

    /// `ns.Type` resolves through the namespace's exported types; a name
    /// that is not a namespace falls back to a scope lookup of the last
    /// segment.
    fn resolve_qualified(&mut self, segments: &[String], location: &SourceLocation) -> Rc<Type> {
        if segments.len() == 2 {
            if let Some(info) = self.namespaces.get(&segments[0]) {
                if let Some(found) = info.types.get(&segments[1]) {
                    return found.clone();
                }
                self.error(
                    location,
                    format!("namespace '{}' has no type '{}'", segments[0], segments[1]),
                    codes::TC_UNDEFINED_TYPE,
                );
                return Type::error();
            }
        }
        let last = segments.last().expect("qualified type has segments");
        match self.scope.lookup_type(last) {
            Some(found) => found,
            None => {
                self.error(
                    location,
                    format!("undefined qualified type: {}", segments.join(".")),
                    codes::TC_UNDEFINED_TYPE,
                );
                Type::error()
            }
        }
    }
}
