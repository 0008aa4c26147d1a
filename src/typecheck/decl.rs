use std::rc::Rc;

use super::{Checker, ClassInfo, NamespaceInfo};
use crate::ast::*;
use crate::diag::codes;
use crate::types::Type;

impl Checker<'_> {
    pub(crate) fn check_decl(&mut self, decl: &Decl) -> Rc<Type> {
        match decl {
            Decl::Var(var) => self.check_var_decl(var),
            Decl::Function(func) => self.check_function_decl(func),
            Decl::Class(class) => self.check_class_decl(class),
            Decl::Interface(interface) => self.check_interface_decl(interface),
            Decl::Enum(en) => self.check_enum_decl(en),
            Decl::Namespace(ns) => self.check_namespace_decl(ns),
            Decl::Typedef(typedef) => self.check_typedef_decl(typedef),
        }
    }

    pub(crate) fn check_var_decl(&mut self, var: &VarDecl) -> Rc<Type> {
        let init_type = var.initializer.as_ref().map(|init| self.check_expr(init));
        let declared_type = var.ty.as_ref().map(|ty| self.resolve_type(ty));

        let var_type = match (declared_type, init_type) {
            (Some(declared), Some(init)) => {
                if !self.check_assignment_compatibility(&declared, &init, &var.location) {
                    return Type::error();
                }
                declared
            }
            (Some(declared), None) => declared,
            (None, Some(init)) => Self::normalize_inferred(init),
            (None, None) => {
                self.error(
                    &var.location,
                    "variable declaration needs either a type or an initializer",
                    codes::TC_BAD_DECLARATION,
                );
                return Type::error();
            }
        };

        self.scope.declare_variable(&var.name, var_type.clone());
        var_type
    }

    pub(crate) fn check_function_decl(&mut self, func: &FunctionDecl) -> Rc<Type> {
        let (fn_type, param_types) = self.resolve_signature(
            &func.generic_params,
            &func.params,
            func.return_type.as_ref(),
        );
        self.scope.declare_function(&func.name, fn_type.clone());

        for ty in &func.throws {
            self.resolve_type(ty);
        }

        if let Some(body) = &func.body {
            let ret = match &*fn_type {
                Type::Function { ret, .. } => ret.clone(),
                _ => Type::error(),
            };
            let previous = self.enter_function_scope(ret);
            self.declare_generic_params(&func.generic_params);
            self.declare_params(&func.params, &param_types);
            self.check_block_statements(body);
            self.exit_function_scope(previous);
        }

        fn_type
    }

    /// Compute a function type without disturbing the current scope: the
    /// generic parameters are declared in a throwaway frame so parameter
    /// types may mention them.
    pub(crate) fn resolve_signature(
        &mut self,
        generic_params: &[GenericParam],
        params: &[Param],
        return_type: Option<&TypeExpr>,
    ) -> (Rc<Type>, Vec<Rc<Type>>) {
        self.scope.enter();
        self.declare_generic_params(generic_params);
        let param_types: Vec<Rc<Type>> = params.iter().map(|p| self.resolve_param(p)).collect();
        let ret = match return_type {
            Some(ty) => self.resolve_type(ty),
            None => Type::void(),
        };
        self.scope.exit();
        (Type::function(ret, param_types.clone()), param_types)
    }

    pub(crate) fn declare_generic_params(&mut self, generic_params: &[GenericParam]) {
        for param in generic_params {
            // A generic parameter checks as an opaque named type; its
            // constraints are resolved for well-formedness only. An
            // unknown name in constraint position is a built-in
            // constraint (Comparable, Numeric, ...), not a type error.
            self.scope.declare_type(&param.name, Type::named(&param.name));
            for constraint in &param.constraints {
                match constraint {
                    TypeExpr::Named(n) if self.scope.lookup_type(&n.name).is_none() => {}
                    TypeExpr::BuiltinConstraint(_) => {}
                    other => {
                        self.resolve_type(other);
                    }
                }
            }
        }
    }

    /// Resolve one parameter's type, wrapping `ref` parameters and
    /// checking the default value.
    pub(crate) fn resolve_param(&mut self, param: &Param) -> Rc<Type> {
        let mut ty = self.resolve_type(&param.ty);
        if param.is_ref {
            ty = Type::reference(ty);
        }
        if let Some(default) = &param.default_value {
            let default_ty = self.check_expr(default);
            if !default_ty.is_assignable_to(&ty) {
                self.error(
                    &param.location,
                    format!(
                        "default value of parameter '{}' has type {default_ty}, expected {ty}",
                        param.name
                    ),
                    codes::TC_INVALID_CONVERSION,
                );
            }
        }
        ty
    }

    pub(crate) fn declare_params(&mut self, params: &[Param], types: &[Rc<Type>]) {
        for (param, ty) in params.iter().zip(types) {
            self.scope.declare_variable(&param.name, ty.clone());
        }
    }

    /// Check a block's statements without opening another scope; used for
    /// function bodies whose scope is the function frame itself.
    pub(crate) fn check_block_statements(&mut self, block: &Block) {
        for stmt in &block.statements {
            self.check_stmt(stmt);
        }
    }

    fn check_class_decl(&mut self, class: &ClassDecl) -> Rc<Type> {
        let class_type = self
            .scope
            .lookup_type(&class.name)
            .unwrap_or_else(|| Type::named(&class.name));

        if let Some(base) = &class.base_class {
            self.resolve_type(base);
        }
        for interface in &class.interfaces {
            self.resolve_type(interface);
        }

        self.scope.enter();
        let previous_class = self.class_type.replace(class_type.clone());
        self.declare_generic_params(&class.generic_params);

        // First sweep: record every member's type so methods can use
        // fields and call each other regardless of declaration order.
        let mut info = ClassInfo::default();
        for member in &class.members {
            match member {
                ClassMember::Field(field) => {
                    let ty = match (&field.ty, &field.initializer) {
                        (Some(ty), _) => self.resolve_type(ty),
                        (None, Some(init)) => Self::normalize_inferred(self.check_expr(init)),
                        (None, None) => {
                            self.error(
                                &field.location,
                                "field must have either an explicit type or an initializer",
                                codes::TC_BAD_DECLARATION,
                            );
                            Type::error()
                        }
                    };
                    self.scope.declare_variable(&field.name, ty.clone());
                    info.fields.insert(field.name.clone(), ty);
                }
                ClassMember::Method(method) => {
                    let (ty, _) = self.resolve_signature(&[], &method.params, method.return_type.as_ref());
                    self.scope.declare_function(&method.name, ty.clone());
                    info.methods.insert(method.name.clone(), ty);
                }
                ClassMember::Constructor(ctor) => {
                    let param_types: Vec<Rc<Type>> =
                        ctor.params.iter().map(|p| self.resolve_param(p)).collect();
                    info.constructor = Some(Type::function(class_type.clone(), param_types));
                }
                ClassMember::Property(prop) => {
                    let ty = self.resolve_type(&prop.ty);
                    info.properties.insert(prop.name.clone(), ty);
                }
            }
        }
        self.classes.insert(class.name.clone(), info);

        // Second sweep: check initializers and bodies.
        for member in &class.members {
            match member {
                ClassMember::Field(field) => self.check_field_body(field),
                ClassMember::Method(method) => self.check_method_body(method),
                ClassMember::Constructor(ctor) => self.check_constructor_body(ctor, &class_type),
                ClassMember::Property(prop) => self.check_property_body(prop),
            }
        }

        self.class_type = previous_class;
        self.scope.exit();
        class_type
    }

    /// Inferred fields were already validated while their type was
    /// computed; only annotated fields need the compatibility check here.
    fn check_field_body(&mut self, field: &FieldDecl) {
        let (Some(init), Some(declared)) = (&field.initializer, &field.ty) else {
            return;
        };
        let init_ty = self.check_expr(init);
        let declared = self.resolve_type(declared);
        if !init_ty.is_assignable_to(&declared) {
            self.error(
                &field.location,
                format!("field initializer has type {init_ty}, expected {declared}"),
                codes::TC_INVALID_CONVERSION,
            );
        }
    }

    fn check_method_body(&mut self, method: &MethodDecl) {
        let Some(body) = &method.body else { return };
        let param_types: Vec<Rc<Type>> =
            method.params.iter().map(|p| self.resolve_param(p)).collect();
        let ret = match &method.return_type {
            Some(ty) => self.resolve_type(ty),
            None => Type::void(),
        };
        let previous = self.enter_function_scope(ret);
        self.declare_params(&method.params, &param_types);
        self.check_block_statements(body);
        self.exit_function_scope(previous);
    }

    fn check_constructor_body(&mut self, ctor: &ConstructorDecl, class_type: &Rc<Type>) {
        let Some(body) = &ctor.body else { return };
        let param_types: Vec<Rc<Type>> =
            ctor.params.iter().map(|p| self.resolve_param(p)).collect();
        let previous = self.enter_function_scope(class_type.clone());
        self.declare_params(&ctor.params, &param_types);
        self.check_block_statements(body);
        self.exit_function_scope(previous);
    }

    fn check_property_body(&mut self, prop: &PropertyDecl) {
        let Some(body) = &prop.body else { return };
        let ty = self.resolve_type(&prop.ty);
        let previous = self.enter_function_scope(match prop.kind {
            PropertyKind::Get => ty.clone(),
            PropertyKind::Set => Type::void(),
        });
        if let Some(param) = &prop.param {
            let param_ty = self.resolve_param(param);
            self.scope.declare_variable(&param.name, param_ty);
        }
        self.check_block_statements(body);
        self.exit_function_scope(previous);
    }

    fn check_interface_decl(&mut self, interface: &InterfaceDecl) -> Rc<Type> {
        let interface_type = self
            .scope
            .lookup_type(&interface.name)
            .unwrap_or_else(|| Type::named(&interface.name));

        self.scope.enter();
        self.declare_generic_params(&interface.generic_params);
        for extended in &interface.extends {
            self.resolve_type(extended);
        }

        let mut info = ClassInfo::default();
        for member in &interface.members {
            match member {
                InterfaceMember::Method(sig) => {
                    let (ty, _) = self.resolve_signature(&[], &sig.params, Some(&sig.return_type));
                    info.methods.insert(sig.name.clone(), ty);
                }
                InterfaceMember::Property(sig) => {
                    let ty = self.resolve_type(&sig.ty);
                    info.properties.insert(sig.name.clone(), ty);
                }
            }
        }
        self.classes.insert(interface.name.clone(), info);

        self.scope.exit();
        interface_type
    }

    fn check_enum_decl(&mut self, en: &EnumDecl) -> Rc<Type> {
        let enum_type = self
            .scope
            .lookup_type(&en.name)
            .unwrap_or_else(|| Type::named(&en.name));

        let underlying = match &en.underlying_type {
            Some(ty) => self.resolve_type(ty),
            None => Type::int(),
        };

        let mut members = std::collections::HashMap::new();
        for member in &en.members {
            if let Some(value) = &member.value {
                let value_ty = self.check_expr(value);
                if !value_ty.is_assignable_to(&underlying) {
                    self.error(
                        &member.location,
                        format!(
                            "enum member value has type {value_ty}, expected {underlying}"
                        ),
                        codes::TC_INVALID_CONVERSION,
                    );
                }
            }
            // Enum members carry the underlying integral type.
            members.insert(member.name.clone(), Type::int());
        }
        self.enums.insert(en.name.clone(), members);

        enum_type
    }

    fn check_namespace_decl(&mut self, ns: &NamespaceDecl) -> Rc<Type> {
        self.scope.enter();

        let mut info = NamespaceInfo::default();
        for decl in &ns.declarations {
            // Nested type declarations must be visible to later siblings.
            match decl {
                Decl::Class(c) => self.scope.declare_type(&c.name, Type::named(&c.name)),
                Decl::Interface(i) => self.scope.declare_type(&i.name, Type::named(&i.name)),
                Decl::Enum(e) => self.scope.declare_type(&e.name, Type::named(&e.name)),
                _ => {}
            }
            let ty = self.check_decl(decl);
            match decl {
                Decl::Var(v) => {
                    info.variables.insert(v.name.clone(), ty);
                }
                Decl::Function(f) => {
                    info.functions.insert(f.name.clone(), ty);
                }
                Decl::Class(c) => {
                    info.types.insert(c.name.clone(), ty);
                }
                Decl::Interface(i) => {
                    info.types.insert(i.name.clone(), ty);
                }
                Decl::Enum(e) => {
                    info.types.insert(e.name.clone(), ty);
                }
                Decl::Typedef(t) => {
                    info.types.insert(t.name.clone(), ty);
                }
                Decl::Namespace(_) => {}
            }
        }
        self.namespaces.insert(ns.name.clone(), info);

        self.scope.exit();
        Type::void()
    }

    fn check_typedef_decl(&mut self, typedef: &TypedefDecl) -> Rc<Type> {
        // Top-level typedefs were resolved in pass 1; re-resolving is
        // harmless and covers namespace-nested aliases.
        let aliased = self.resolve_type(&typedef.aliased);
        self.scope.declare_type(&typedef.name, aliased.clone());
        aliased
    }
}

#[cfg(test)]
mod tests {
    use crate::typecheck::tests::{assert_check_fails, assert_checks};

    #[test]
    fn variable_inference_and_annotation() {
        assert_checks("let a = 1; let b: float = a; let c: int = a;");
    }

    #[test]
    fn initializer_must_match_annotation() {
        assert_check_fails(r#"let x: int = "hi";"#, "TC2002");
    }

    #[test]
    fn declaration_needs_type_or_initializer() {
        assert_check_fails("function f(): void { let x; }", "TC5002");
    }

    #[test]
    fn function_parameters_are_visible_in_body() {
        assert_checks("function add(a: int, b: int): int { return a + b; }");
    }

    #[test]
    fn return_type_mismatch_is_reported() {
        assert_check_fails(
            r#"function f(): int { return "nope"; }"#,
            "TC4004",
        );
    }

    #[test]
    fn generic_function_parameters_check_structurally() {
        assert_checks("function id<T>(x: T): T { return x; }");
    }

    #[test]
    fn ref_parameter_wraps_in_reference() {
        assert_checks("function f(ref out: int): void { }");
    }

    #[test]
    fn default_value_type_is_checked() {
        assert_check_fails(
            r#"function f(n: int = "s"): void { }"#,
            "TC2002",
        );
    }

    #[test]
    fn class_methods_see_fields_and_this() {
        assert_checks(
            "class Counter {
                count: int = 0;
                bump(): int { return this.count + 1; }
            }",
        );
    }

    #[test]
    fn class_member_order_does_not_matter() {
        assert_checks(
            "class A {
                f(): int { return this.g(); }
                g(): int { return 1; }
            }",
        );
    }

    #[test]
    fn constructor_checks_in_class_scope() {
        assert_checks(
            "class P {
                x: int = 0;
                constructor(x0: int) { this.x = x0; }
            }",
        );
    }

    #[test]
    fn property_bodies_are_checked() {
        assert_checks(
            "class Rect {
                _w: float = 1.0;
                get width: float { return this._w; }
                set width(value: float) { this._w = value; }
            }",
        );
    }

    #[test]
    fn enum_member_values_must_fit_underlying_type() {
        assert_check_fails(r#"enum E { A = "x" }"#, "TC2002");
        assert_checks("enum Color { Red = 1, Green, Blue }");
    }

    #[test]
    fn interface_members_resolve() {
        assert_checks(
            "interface Shape { area(): float; name: string; }",
        );
    }

    #[test]
    fn namespace_members_are_scoped() {
        // `pi` is not visible outside the namespace without qualification.
        assert_check_fails(
            "namespace math { const pi: float = 3.14; }
             let x: float = pi;",
            "TC5001",
        );
    }
}
