use std::rc::Rc;

use super::Checker;
use crate::ast::*;
use crate::diag::codes;
use crate::location::SourceLocation;
use crate::token::TokenKind;
use crate::types::Type;

impl Checker<'_> {
    pub(crate) fn check_expr(&mut self, expr: &Expr) -> Rc<Type> {
        match expr {
            Expr::Literal(e) => self.check_literal(e),
            Expr::Identifier(e) => self.check_identifier(e),
            Expr::Binary(e) => self.check_binary(e),
            Expr::Unary(e) => self.check_unary(e),
            Expr::Assignment(e) => self.check_assignment(e),
            Expr::Conditional(e) => self.check_conditional(e),
            Expr::Call(e) => self.check_call(e),
            Expr::Member(e) => self.check_member(e),
            Expr::Index(e) => self.check_index(e),
            Expr::ArrayLiteral(e) => self.check_array_literal(e),
            Expr::This(location) => self.check_this(location),
            Expr::New(e) => self.check_new(e),
            Expr::Cast(e) => self.check_cast(e),
            Expr::CompileTime(e) => self.check_compile_time(e),
            Expr::PointerOf(e) => {
                let operand = self.check_expr(&e.operand);
                Type::pointer(operand, e.is_unsafe)
            }
            Expr::Function(e) => self.check_function_expr(e),
        }
    }

    fn check_literal(&mut self, lit: &LiteralExpr) -> Rc<Type> {
        match lit.kind {
            LiteralKind::Number => {
                if lit.text.contains('.') {
                    Type::float()
                } else if lit.text == "0" {
                    Type::int_literal_zero()
                } else {
                    Type::int()
                }
            }
            LiteralKind::String => Type::string(),
            LiteralKind::Bool => Type::bool(),
            // `null` behaves as the null pointer constant, like literal 0.
            LiteralKind::Null => Type::int_literal_zero(),
        }
    }

    fn check_identifier(&mut self, ident: &IdentifierExpr) -> Rc<Type> {
        if let Some(ty) = self.scope.lookup_variable(&ident.name) {
            return ty;
        }
        if let Some(ty) = self.scope.lookup_function(&ident.name) {
            return ty;
        }
        self.error(
            &ident.location,
            format!("undefined identifier: {}", ident.name),
            codes::TC_UNDEFINED_VARIABLE,
        );
        Type::error()
    }

    fn check_binary(&mut self, expr: &BinaryExpr) -> Rc<Type> {
        let left = self.check_expr(&expr.left);
        let right = self.check_expr(&expr.right);
        self.check_binary_op(expr.op, &left, &right, &expr.location)
    }

    pub(crate) fn check_binary_op(
        &mut self,
        op: TokenKind,
        left: &Rc<Type>,
        right: &Rc<Type>,
        location: &SourceLocation,
    ) -> Rc<Type> {
        if left.is_error() || right.is_error() {
            return Type::error();
        }

        if op.is_arithmetic_op() {
            if left.is_numeric() && right.is_numeric() {
                if matches!(**left, Type::Float) || matches!(**right, Type::Float) {
                    return Type::float();
                }
                return Type::int();
            }
            // `+` concatenates when either side is a string.
            if op == TokenKind::Plus
                && (matches!(**left, Type::String) || matches!(**right, Type::String))
            {
                return Type::string();
            }
            self.error(
                location,
                format!("invalid operands for arithmetic operator: {left} and {right}"),
                codes::TC_INVALID_BINARY_OP,
            );
            return Type::error();
        }

        if op.is_comparison_op() {
            if left.is_assignable_to(right) || right.is_assignable_to(left) {
                return Type::bool();
            }
            self.error(
                location,
                format!("cannot compare {left} with {right}"),
                codes::TC_INVALID_BINARY_OP,
            );
            return Type::error();
        }

        if op == TokenKind::AmpersandAmpersand || op == TokenKind::PipePipe {
            let bool_ty = Type::bool();
            if left.is_implicitly_convertible_to(&bool_ty)
                && right.is_implicitly_convertible_to(&bool_ty)
            {
                return bool_ty;
            }
            self.error(
                location,
                "logical operators require boolean operands",
                codes::TC_INVALID_BINARY_OP,
            );
            return Type::error();
        }

        if op.is_bitwise_op() {
            if left.is_int() && right.is_int() {
                return Type::int();
            }
            self.error(
                location,
                "bitwise operators require integer operands",
                codes::TC_INVALID_BINARY_OP,
            );
            return Type::error();
        }

        self.error(
            location,
            format!("unhandled binary operator '{op}'"),
            codes::TC_INVALID_BINARY_OP,
        );
        Type::error()
    }

    fn check_unary(&mut self, expr: &UnaryExpr) -> Rc<Type> {
        let operand = self.check_expr(&expr.operand);
        if operand.is_error() {
            return Type::error();
        }

        match expr.op {
            TokenKind::Plus | TokenKind::Minus => {
                if operand.is_numeric() {
                    return operand;
                }
                self.error(
                    expr.operand.location(),
                    format!("unary '{}' requires a numeric operand, got {operand}", expr.op),
                    codes::TC_INVALID_UNARY_OP,
                );
                Type::error()
            }
            TokenKind::Exclaim => {
                if operand.is_implicitly_convertible_to(&Type::bool()) {
                    return Type::bool();
                }
                self.error(
                    expr.operand.location(),
                    "logical NOT requires a boolean operand",
                    codes::TC_INVALID_UNARY_OP,
                );
                Type::error()
            }
            TokenKind::Tilde => {
                if operand.is_int() {
                    return Type::int();
                }
                self.error(
                    expr.operand.location(),
                    "bitwise NOT requires an integer operand",
                    codes::TC_INVALID_UNARY_OP,
                );
                Type::error()
            }
            TokenKind::PlusPlus | TokenKind::MinusMinus => {
                if operand.is_numeric() {
                    return operand;
                }
                self.error(
                    expr.operand.location(),
                    "increment/decrement requires a numeric operand",
                    codes::TC_INVALID_UNARY_OP,
                );
                Type::error()
            }
            TokenKind::Star => match &*operand {
                Type::Pointer { pointee, .. } => pointee.clone(),
                _ => {
                    self.error(
                        expr.operand.location(),
                        format!("cannot dereference non-pointer type {operand}"),
                        codes::TC_INVALID_UNARY_OP,
                    );
                    Type::error()
                }
            },
            TokenKind::At => Type::pointer(operand, false),
            _ => {
                self.error(
                    &expr.location,
                    format!("unhandled unary operator '{}'", expr.op),
                    codes::TC_INVALID_UNARY_OP,
                );
                Type::error()
            }
        }
    }

    fn check_assignment(&mut self, expr: &AssignmentExpr) -> Rc<Type> {
        let target = self.check_expr(&expr.target);
        let value = self.check_expr(&expr.value);

        if expr.op == TokenKind::Equals {
            if !self.check_assignment_compatibility(&target, &value, &expr.location) {
                return Type::error();
            }
            return target;
        }

        // Compound assignment desugars to the base binary operator and
        // checks assignability of the result back into the target.
        let Some(base_op) = expr.op.compound_base() else {
            self.error(
                &expr.location,
                format!("unsupported compound assignment operator '{}'", expr.op),
                codes::TC_INVALID_BINARY_OP,
            );
            return Type::error();
        };
        let result = self.check_binary_op(base_op, &target, &value, &expr.location);
        if !result.is_assignable_to(&target) {
            self.error(
                &expr.location,
                format!("result of compound assignment has type {result}, not assignable to {target}"),
                codes::TC_INVALID_CONVERSION,
            );
            return Type::error();
        }
        target
    }

    fn check_conditional(&mut self, expr: &ConditionalExpr) -> Rc<Type> {
        let condition = self.check_expr(&expr.condition);
        if !condition.is_implicitly_convertible_to(&Type::bool()) {
            self.error(
                expr.condition.location(),
                "conditional expression condition must be convertible to boolean",
                codes::TC_INVALID_CONVERSION,
            );
        }

        let then_ty = self.check_expr(&expr.then_expr);
        let else_ty = self.check_expr(&expr.else_expr);

        // The more general branch type wins.
        if then_ty.is_assignable_to(&else_ty) {
            else_ty
        } else if else_ty.is_assignable_to(&then_ty) {
            then_ty
        } else {
            self.error(
                &expr.location,
                format!("conditional branches have incompatible types {then_ty} and {else_ty}"),
                codes::TC_INVALID_BINARY_OP,
            );
            Type::error()
        }
    }

    fn check_call(&mut self, expr: &CallExpr) -> Rc<Type> {
        let callee = self.check_expr(&expr.callee);
        if callee.is_error() {
            // Still visit the arguments for their own diagnostics.
            for arg in &expr.arguments {
                self.check_expr(arg);
            }
            return Type::error();
        }

        let Type::Function { ret, params } = &*callee else {
            self.error(
                expr.callee.location(),
                format!("cannot call non-function type {callee}"),
                codes::TC_NOT_CALLABLE,
            );
            return Type::error();
        };

        // Generic type arguments are accepted and validated structurally:
        // each must name a type in scope.
        for type_arg in &expr.type_arguments {
            let is_primitive = matches!(
                type_arg.as_str(),
                "void" | "int" | "float" | "boolean" | "string"
            );
            if !is_primitive && self.scope.lookup_type(type_arg).is_none() {
                self.error(
                    &expr.location,
                    format!("undefined type: {type_arg}"),
                    codes::TC_UNDEFINED_TYPE,
                );
            }
        }

        if params.len() != expr.arguments.len() {
            self.error(
                &expr.location,
                format!(
                    "wrong number of arguments: expected {}, got {}",
                    params.len(),
                    expr.arguments.len()
                ),
                codes::TC_ARITY_MISMATCH,
            );
            return Type::error();
        }

        let ret = ret.clone();
        let params = params.clone();
        // A call with explicit type arguments is a generic instantiation;
        // its value arguments are validated structurally only, since the
        // parameter types still name the generic placeholders.
        let generic_call = !expr.type_arguments.is_empty();
        for (arg, param_ty) in expr.arguments.iter().zip(&params) {
            let arg_ty = self.check_expr(arg);
            if generic_call {
                continue;
            }
            // A `ref` parameter accepts the referent type directly.
            let accepts = match &**param_ty {
                Type::Reference(target) => arg_ty.is_assignable_to(target),
                _ => arg_ty.is_assignable_to(param_ty),
            };
            if !accepts {
                self.error(
                    arg.location(),
                    format!("argument has type {arg_ty}, expected {param_ty}"),
                    codes::TC_ARGUMENT_MISMATCH,
                );
            }
        }
        ret
    }

    /// Member access resolves against the object's resolved type: class
    /// and interface members through their tables, pointers and smart
    /// pointers through the pointee, namespaces and enums through their
    /// own member maps.
    fn check_member(&mut self, expr: &MemberExpr) -> Rc<Type> {
        // Namespace and enum accesses never type their object: the name
        // is not a value.
        if let Expr::Identifier(ident) = &*expr.object {
            if let Some(info) = self.namespaces.get(&ident.name) {
                if let Some(found) = info
                    .variables
                    .get(&expr.member)
                    .or_else(|| info.functions.get(&expr.member))
                {
                    return found.clone();
                }
                self.error(
                    &expr.location,
                    format!("namespace '{}' has no member '{}'", ident.name, expr.member),
                    codes::TC_MEMBER_NOT_FOUND,
                );
                return Type::error();
            }
            if let Some(members) = self.enums.get(&ident.name) {
                if let Some(found) = members.get(&expr.member) {
                    return found.clone();
                }
                self.error(
                    &expr.location,
                    format!("enum '{}' has no member '{}'", ident.name, expr.member),
                    codes::TC_MEMBER_NOT_FOUND,
                );
                return Type::error();
            }
        }

        let object_ty = self.check_expr(&expr.object);
        if object_ty.is_error() {
            return Type::error();
        }

        // `@member` requires a pointer-shaped object; `.member` tolerates
        // one level of indirection either way.
        let target = match &*object_ty {
            Type::Pointer { pointee, .. } => pointee.clone(),
            Type::Smart { pointee, .. } => pointee.clone(),
            Type::Reference(target) => target.clone(),
            _ if expr.through_pointer => {
                self.error(
                    &expr.location,
                    format!("'@' member access requires a pointer, got {object_ty}"),
                    codes::TC_MEMBER_NOT_FOUND,
                );
                return Type::error();
            }
            _ => object_ty.clone(),
        };

        let Type::Named(class_name) = &*target else {
            self.error(
                &expr.location,
                format!("type {target} has no members"),
                codes::TC_MEMBER_NOT_FOUND,
            );
            return Type::error();
        };

        match self.classes.get(class_name).and_then(|info| info.member(&expr.member)) {
            Some(found) => found,
            None => {
                self.error(
                    &expr.location,
                    format!("type {class_name} has no member '{}'", expr.member),
                    codes::TC_MEMBER_NOT_FOUND,
                );
                Type::error()
            }
        }
    }

    fn check_index(&mut self, expr: &IndexExpr) -> Rc<Type> {
        let object = self.check_expr(&expr.object);
        let index = self.check_expr(&expr.index);

        if object.is_error() {
            return Type::error();
        }
        let Type::Array(element) = &*object else {
            self.error(
                expr.object.location(),
                format!("cannot index non-array type {object}"),
                codes::TC_INVALID_BINARY_OP,
            );
            return Type::error();
        };
        if !index.is_implicitly_convertible_to(&Type::int()) {
            self.error(
                expr.index.location(),
                format!("array index must be an integer, got {index}"),
                codes::TC_INVALID_CONVERSION,
            );
        }
        element.clone()
    }

    fn check_array_literal(&mut self, expr: &ArrayLiteralExpr) -> Rc<Type> {
        let Some(first) = expr.elements.first() else {
            self.error(
                &expr.location,
                "cannot determine the type of an empty array literal",
                codes::TC_BAD_DECLARATION,
            );
            return Type::error();
        };

        let element_ty = Self::normalize_inferred(self.check_expr(first));
        for element in &expr.elements[1..] {
            let ty = self.check_expr(element);
            if !ty.is_assignable_to(&element_ty) {
                self.error(
                    element.location(),
                    format!("array element has type {ty}, expected {element_ty}"),
                    codes::TC_INVALID_CONVERSION,
                );
                return Type::error();
            }
        }
        Type::array(element_ty)
    }

    fn check_this(&mut self, location: &SourceLocation) -> Rc<Type> {
        match &self.class_type {
            Some(class_ty) => class_ty.clone(),
            None => {
                self.error(
                    location,
                    "'this' can only be used inside a class",
                    codes::TC_UNDEFINED_VARIABLE,
                );
                Type::error()
            }
        }
    }

    fn check_new(&mut self, expr: &NewExpr) -> Rc<Type> {
        let Some(class_ty) = self.scope.lookup_type(&expr.class_name) else {
            self.error(
                &expr.location,
                format!("undefined class: {}", expr.class_name),
                codes::TC_UNDEFINED_TYPE,
            );
            for arg in &expr.arguments {
                self.check_expr(arg);
            }
            return Type::error();
        };

        // Check against the recorded constructor when the class body has
        // already been seen; otherwise just visit the arguments.
        let ctor = self
            .classes
            .get(&expr.class_name)
            .and_then(|info| info.constructor.clone());
        match ctor {
            Some(ctor_ty) => {
                if let Type::Function { params, .. } = &*ctor_ty {
                    if params.len() != expr.arguments.len() {
                        self.error(
                            &expr.location,
                            format!(
                                "constructor of {} takes {} argument(s), got {}",
                                expr.class_name,
                                params.len(),
                                expr.arguments.len()
                            ),
                            codes::TC_ARITY_MISMATCH,
                        );
                    }
                    let params = params.clone();
                    for (arg, param_ty) in expr.arguments.iter().zip(&params) {
                        let arg_ty = self.check_expr(arg);
                        if !arg_ty.is_assignable_to(param_ty) {
                            self.error(
                                arg.location(),
                                format!("argument has type {arg_ty}, expected {param_ty}"),
                                codes::TC_ARGUMENT_MISMATCH,
                            );
                        }
                    }
                }
            }
            None => {
                for arg in &expr.arguments {
                    self.check_expr(arg);
                }
            }
        }
        class_ty
    }

    fn check_cast(&mut self, expr: &CastExpr) -> Rc<Type> {
        let source = self.check_expr(&expr.expr);
        let target = self.resolve_type(&expr.target_type);
        if target.is_error() {
            return Type::error();
        }
        if !source.is_explicitly_convertible_to(&target) {
            self.error(
                &expr.location,
                format!("invalid cast from {source} to {target}"),
                codes::TC_INVALID_CAST,
            );
            return Type::error();
        }
        target
    }

    fn check_compile_time(&mut self, expr: &CompileTimeExpr) -> Rc<Type> {
        let operand = self.check_expr(&expr.operand);
        match expr.op {
            CompileTimeOp::Sizeof | CompileTimeOp::Alignof => Type::int(),
            CompileTimeOp::Typeof => Type::string(),
            CompileTimeOp::ConstExpr => operand,
        }
    }

    fn check_function_expr(&mut self, expr: &FunctionExpr) -> Rc<Type> {
        let (fn_type, param_types) = self.resolve_signature(&[], &expr.params, expr.return_type.as_ref());
        let ret = match &*fn_type {
            Type::Function { ret, .. } => ret.clone(),
            _ => Type::error(),
        };
        let previous = self.enter_function_scope(ret);
        self.declare_params(&expr.params, &param_types);
        self.check_block_statements(&expr.body);
        self.exit_function_scope(previous);
        fn_type
    }
}

#[cfg(test)]
mod tests {
    use crate::typecheck::tests::{assert_check_fails, assert_checks, check_source};

    #[test]
    fn arithmetic_widens_to_float() {
        assert_checks("let x: float = 1 + 2.5;");
        assert_checks("let y: int = 1 + 2;");
        assert_check_fails("let z: int = 1 + 2.5;", "TC2002");
    }

    #[test]
    fn string_concatenation_with_plus() {
        assert_checks(r#"let s: string = "a" + 1;"#);
        assert_check_fails(r#"let s: string = "a" - 1;"#, "TC3001");
    }

    #[test]
    fn comparisons_yield_bool() {
        assert_checks("let b: bool = 1 < 2;");
        assert_check_fails(r#"let b: bool = 1 < "s";"#, "TC3001");
    }

    #[test]
    fn logical_operators_need_boolish_operands() {
        assert_checks("let b: bool = true && 1;");
        assert_check_fails(r#"let b: bool = "s" || true;"#, "TC3001");
    }

    #[test]
    fn bitwise_needs_ints() {
        assert_checks("let x: int = (1 & 3) | (4 ^ 2) << 1 >> 1;");
        assert_check_fails("let x = 1.5 & 2;", "TC3001");
    }

    #[test]
    fn unary_operators() {
        assert_checks("let a = -1; let b = !true; let c = ~3; let d = -2.5;");
        assert_check_fails(r#"let x = -"s";"#, "TC3002");
        assert_check_fails(r#"let x = ~1.5;"#, "TC3002");
    }

    #[test]
    fn deref_and_address_of() {
        assert_checks("let x = 1; let p = @x; let y: int = *p;");
        assert_check_fails("let x = 1; let y = *x;", "TC3002");
    }

    #[test]
    fn undefined_identifier() {
        assert_check_fails("ghost;", "TC5001");
    }

    #[test]
    fn assignment_and_compound_assignment() {
        assert_checks("let x = 1; x = 2; x += 3; x %= 2;");
        assert_check_fails(r#"let x = 1; x = "s";"#, "TC2002");
        // int += float produces float, which does not fit back into int.
        assert_check_fails("let x = 1; x += 0.5;", "TC2002");
    }

    #[test]
    fn conditional_picks_the_general_branch() {
        assert_checks("let x: float = true ? 1 : 2.5;");
        assert_check_fails(r#"let x = true ? 1 : "s";"#, "TC3001");
    }

    #[test]
    fn calls_check_arity_and_argument_types() {
        assert_checks(
            "function add(a: int, b: int): int { return a + b; }
             let x: int = add(1, 2);",
        );
        assert_check_fails(
            "function f(a: int): void { }
             f();",
            "TC4002",
        );
        assert_check_fails(
            r#"function f(a: int): void { }
               f("s");"#,
            "TC4003",
        );
        assert_check_fails("let x = 1; x(2);", "TC4001");
    }

    #[test]
    fn generic_call_type_arguments_are_validated() {
        assert_checks(
            "function id<T>(x: T): T { return x; }
             class Widget { }
             id<Widget>(new Widget());",
        );
        assert_check_fails(
            "function id<T>(x: T): T { return x; }
             id<Ghost>(1);",
            "TC2001",
        );
    }

    #[test]
    fn member_access_on_class_fields_methods_properties() {
        assert_checks(
            "class Rect {
                w: float = 1.0;
                area(): float { return this.w; }
                get width: float { return this.w; }
             }
             let r: Rect = new Rect();
             let a: float = r.w;
             let b: float = r.width;
             let c: float = r.area();",
        );
        assert_check_fails(
            "class A { }
             let a: A = new A();
             a.ghost;",
            "TC2003",
        );
    }

    #[test]
    fn member_access_resolves_through_pointers() {
        assert_checks(
            "class Node { value: int = 0; }
             let n: Node = new Node();
             let p: Node@ = @n;
             let v: int = p@value;
             let w: int = p.value;
             let s: #shared<Node> = cast<#shared<Node>>(@n);
             let u: int = s.value;",
        );
        assert_check_fails("let x = 1; x@field;", "TC2003");
    }

    #[test]
    fn namespace_and_enum_members() {
        assert_checks(
            "namespace math { const pi: float = 3.14; function twice(x: int): int { return x * 2; } }
             enum Color { Red = 1, Green }
             let x: float = math.pi;
             let y: int = math.twice(2);
             let c: int = Color.Red;",
        );
        assert_check_fails(
            "namespace math { const pi: float = 3.14; }
             math.tau;",
            "TC2003",
        );
        assert_check_fails(
            "enum Color { Red }
             Color.Purple;",
            "TC2003",
        );
    }

    #[test]
    fn indexing_arrays() {
        assert_checks("let xs = [1, 2, 3]; let x: int = xs[0];");
        assert_check_fails("let x = 1; x[0];", "TC3001");
        assert_check_fails(r#"let xs = [1]; xs["k"];"#, "TC2002");
    }

    #[test]
    fn array_literals_require_compatible_elements() {
        assert_check_fails(r#"let xs = [1, "s"];"#, "TC2002");
        assert_check_fails("let xs = [];", "TC5002");
    }

    #[test]
    fn this_outside_class_is_rejected() {
        assert_check_fails("this;", "TC5001");
    }

    #[test]
    fn casts_follow_explicit_convertibility() {
        assert_checks("let x: int = cast<int>(2.5); let s: string = cast<string>(1);");
        assert_check_fails(r#"let x: int = cast<int>("s");"#, "TC3003");
    }

    #[test]
    fn compile_time_operators_have_fixed_types() {
        assert_checks(
            "let x = 1;
             let s: int = #sizeof(x);
             let a: int = #alignof(x);
             let t: string = #typeof(x);
             let c: int = #const(x);",
        );
    }

    #[test]
    fn null_is_a_null_pointer_constant() {
        assert_checks("let p: int@ = null; let q: int@ = 0;");
        assert_check_fails("let n = 1; let p: int@ = n;", "TC2002");
    }

    #[test]
    fn function_expressions_are_typed() {
        assert_checks(
            "let f: function(int): int = function (x: int): int { return x; };",
        );
    }

    #[test]
    fn error_types_do_not_cascade() {
        let (_, reporter) = check_source("let x: int = ghost + 1;");
        // Only the undefined identifier is reported; the addition and the
        // assignment stay quiet.
        assert_eq!(reporter.error_count(), 1);
    }
}
