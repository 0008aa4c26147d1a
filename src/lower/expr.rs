use std::collections::HashMap;
use std::mem;

use super::{Lowerer, Slot};
use crate::ast::*;
use crate::diag::codes;
use crate::ir::{BinOp, CmpOp, IrType, Value};
use crate::token::TokenKind;

/// A lowered expression: either an address (something assignable) or a
/// computed value. Loads happen exactly where a value is needed.
#[derive(Debug, Clone)]
pub(crate) enum Lowered {
    LValue { addr: Value, ty: IrType },
    RValue(Rv),
}

#[derive(Debug, Clone)]
pub(crate) struct Rv {
    pub value: Value,
    pub ty: IrType,
}

impl Lowered {
    pub fn rvalue(value: Value, ty: IrType) -> Lowered {
        Lowered::RValue(Rv { value, ty })
    }

    pub fn ty(&self) -> &IrType {
        match self {
            Lowered::LValue { ty, .. } => ty,
            Lowered::RValue(rv) => &rv.ty,
        }
    }
}

impl Lowerer<'_> {
    /// Lower and load: any use that needs the value of an lvalue emits a
    /// load here.
    pub(crate) fn lower_expr_rvalue(&mut self, expr: &Expr) -> Rv {
        let lowered = self.lower_expr(expr);
        self.load(lowered)
    }

    pub(crate) fn load(&mut self, lowered: Lowered) -> Rv {
        match lowered {
            Lowered::RValue(rv) => rv,
            Lowered::LValue { addr, ty } => {
                let value = self.builder.create_load(ty.clone(), addr);
                Rv { value, ty }
            }
        }
    }

    /// Lower an expression used as a branch condition down to an `i1`.
    pub(crate) fn lower_condition(&mut self, expr: &Expr) -> Value {
        let rv = self.lower_expr_rvalue(expr);
        self.to_bool(rv)
    }

    fn to_bool(&mut self, rv: Rv) -> Value {
        match &rv.ty {
            IrType::I1 => rv.value,
            IrType::F32 => self.builder.create_cmp(
                CmpOp::Ne,
                true,
                IrType::F32,
                rv.value,
                Value::Float(0.0),
            ),
            IrType::Ptr(_) => self.builder.create_cmp(
                CmpOp::Ne,
                false,
                rv.ty.clone(),
                rv.value,
                Value::Null,
            ),
            _ => self
                .builder
                .create_cmp(CmpOp::Ne, false, rv.ty.clone(), rv.value, Value::Int(0)),
        }
    }

    pub(crate) fn lower_expr(&mut self, expr: &Expr) -> Lowered {
        match expr {
            Expr::Literal(lit) => self.lower_literal(lit),
            Expr::Identifier(ident) => self.lower_identifier(ident),
            Expr::Binary(e) => self.lower_binary(e),
            Expr::Unary(e) => self.lower_unary(e),
            Expr::Assignment(e) => self.lower_assignment(e),
            Expr::Conditional(e) => self.lower_conditional(e),
            Expr::Call(e) => self.lower_call(e),
            Expr::Member(e) => self.lower_member(e),
            Expr::Index(e) => self.lower_index(e),
            Expr::ArrayLiteral(e) => Lowered::RValue(self.lower_array_literal(e)),
            Expr::This(location) => {
                self.unsupported(location, "'this' outside a lowered context");
                Lowered::rvalue(Value::Null, IrType::ptr_to(IrType::I8))
            }
            Expr::New(e) => self.lower_new(e),
            Expr::Cast(e) => self.lower_cast(e),
            Expr::CompileTime(e) => self.lower_compile_time(e),
            Expr::PointerOf(e) => self.lower_address_of(&e.operand, &e.location),
            Expr::Function(e) => self.lower_function_expr(e),
        }
    }

    fn lower_literal(&mut self, lit: &LiteralExpr) -> Lowered {
        match lit.kind {
            LiteralKind::Number => {
                if lit.text.contains('.') {
                    let value = lit.text.parse::<f64>().unwrap_or(0.0);
                    Lowered::rvalue(Value::Float(value), IrType::F32)
                } else {
                    let value = lit.text.parse::<i64>().unwrap_or(0);
                    Lowered::rvalue(Value::Int(value), IrType::I32)
                }
            }
            LiteralKind::String => {
                let value = self.builder.create_global_string(&lit.text);
                Lowered::rvalue(value, IrType::ptr_to(IrType::I8))
            }
            LiteralKind::Bool => Lowered::rvalue(Value::Bool(lit.text == "true"), IrType::I1),
            LiteralKind::Null => Lowered::rvalue(Value::Null, IrType::ptr_to(IrType::I8)),
        }
    }

    fn lower_identifier(&mut self, ident: &IdentifierExpr) -> Lowered {
        if let Some(slot) = self.lookup_local(&ident.name) {
            return Lowered::LValue {
                addr: slot.addr.clone(),
                ty: slot.ty.clone(),
            };
        }
        if let Some(slot) = self.lookup_global(&ident.name) {
            return Lowered::LValue {
                addr: slot.addr.clone(),
                ty: slot.ty.clone(),
            };
        }
        if let Some((ret, params)) = self.builder.function_signature(&ident.name) {
            let ty = IrType::ptr_to(IrType::Func {
                ret: Box::new(ret),
                params,
                varargs: false,
            });
            return Lowered::rvalue(Value::Global(ident.name.clone()), ty);
        }
        if self.is_outer_binding(&ident.name) {
            self.error(
                &ident.location,
                format!(
                    "function expressions do not capture; '{}' belongs to the enclosing function",
                    ident.name
                ),
                codes::CG_FREE_VARIABLE,
            );
        } else {
            self.error(
                &ident.location,
                format!("undefined variable: {}", ident.name),
                codes::CG_UNDEFINED_VARIABLE,
            );
        }
        Lowered::rvalue(Value::Int(0), IrType::I32)
    }

    fn lower_binary(&mut self, expr: &BinaryExpr) -> Lowered {
        // Logical operators short-circuit through a result slot.
        if expr.op == TokenKind::AmpersandAmpersand || expr.op == TokenKind::PipePipe {
            return self.lower_short_circuit(expr);
        }

        let lhs = self.lower_expr_rvalue(&expr.left);
        let rhs = self.lower_expr_rvalue(&expr.right);
        let float = lhs.ty.is_float() || rhs.ty.is_float();

        if expr.op.is_comparison_op() {
            let op = match expr.op {
                TokenKind::EqualsEquals => CmpOp::Eq,
                TokenKind::ExclaimEquals => CmpOp::Ne,
                TokenKind::Less => CmpOp::Lt,
                TokenKind::LessEquals => CmpOp::Le,
                TokenKind::Greater => CmpOp::Gt,
                _ => CmpOp::Ge,
            };
            let ty = if float { IrType::F32 } else { lhs.ty.clone() };
            let value = self.builder.create_cmp(op, float, ty, lhs.value, rhs.value);
            return Lowered::rvalue(value, IrType::I1);
        }

        let (op, ty) = match expr.op {
            TokenKind::Plus if float => (BinOp::FAdd, IrType::F32),
            TokenKind::Minus if float => (BinOp::FSub, IrType::F32),
            TokenKind::Star if float => (BinOp::FMul, IrType::F32),
            TokenKind::Slash if float => (BinOp::FDiv, IrType::F32),
            TokenKind::Plus => (BinOp::Add, IrType::I32),
            TokenKind::Minus => (BinOp::Sub, IrType::I32),
            TokenKind::Star => (BinOp::Mul, IrType::I32),
            TokenKind::Slash => (BinOp::Div, IrType::I32),
            TokenKind::Percent => (BinOp::Rem, IrType::I32),
            TokenKind::Ampersand => (BinOp::And, IrType::I32),
            TokenKind::Pipe => (BinOp::Or, IrType::I32),
            TokenKind::Caret => (BinOp::Xor, IrType::I32),
            TokenKind::LeftShift => (BinOp::Shl, IrType::I32),
            TokenKind::RightShift => (BinOp::Shr, IrType::I32),
            other => {
                self.error(
                    &expr.location,
                    format!("cannot lower binary operator '{other}'"),
                    codes::CG_INVALID_BINARY_OP,
                );
                return Lowered::rvalue(Value::Int(0), IrType::I32);
            }
        };

        // String concatenation has no runtime support in the emitted IR.
        if matches!(lhs.ty, IrType::Ptr(_)) || matches!(rhs.ty, IrType::Ptr(_)) {
            self.unsupported(&expr.location, "string concatenation");
            return Lowered::rvalue(Value::Int(0), IrType::I32);
        }

        let value = self.builder.create_binary(op, ty.clone(), lhs.value, rhs.value);
        Lowered::rvalue(value, ty)
    }

    fn lower_short_circuit(&mut self, expr: &BinaryExpr) -> Lowered {
        let result = self.builder.create_alloca("logic", IrType::I1);
        let rhs_label = self.builder.create_block("logic.rhs");
        let end_label = self.builder.create_block("logic.end");

        let lhs = self.lower_condition(&expr.left);
        match expr.op {
            // a && b: only evaluate b when a is true.
            TokenKind::AmpersandAmpersand => {
                self.builder
                    .create_store(IrType::I1, lhs.clone(), result.clone());
                self.builder.create_cond_br(lhs, &rhs_label, &end_label);
            }
            // a || b: only evaluate b when a is false.
            _ => {
                self.builder
                    .create_store(IrType::I1, lhs.clone(), result.clone());
                self.builder.create_cond_br(lhs, &end_label, &rhs_label);
            }
        }

        self.builder.set_insertion_block(&rhs_label);
        let rhs = self.lower_condition(&expr.right);
        self.builder.create_store(IrType::I1, rhs, result.clone());
        self.builder.create_br(&end_label);

        self.builder.set_insertion_block(&end_label);
        let value = self.builder.create_load(IrType::I1, result);
        Lowered::rvalue(value, IrType::I1)
    }

    fn lower_unary(&mut self, expr: &UnaryExpr) -> Lowered {
        match expr.op {
            TokenKind::PlusPlus | TokenKind::MinusMinus => {
                return self.lower_incdec(expr);
            }
            TokenKind::At => return self.lower_address_of(&expr.operand, &expr.location),
            TokenKind::Star => {
                let pointer = self.lower_expr_rvalue(&expr.operand);
                let pointee = match &pointer.ty {
                    IrType::Ptr(inner) => (**inner).clone(),
                    _ => {
                        self.error(
                            expr.operand.location(),
                            "cannot dereference a non-pointer value",
                            codes::CG_INVALID_BINARY_OP,
                        );
                        IrType::I32
                    }
                };
                return Lowered::LValue {
                    addr: pointer.value,
                    ty: pointee,
                };
            }
            _ => {}
        }

        let operand = self.lower_expr_rvalue(&expr.operand);
        match expr.op {
            TokenKind::Minus => {
                let value = self.builder.create_neg(operand.ty.clone(), operand.value);
                Lowered::rvalue(value, operand.ty)
            }
            TokenKind::Plus => Lowered::RValue(operand),
            TokenKind::Exclaim => {
                let as_bool = self.to_bool(operand);
                let value = self.builder.create_not(IrType::I1, as_bool);
                Lowered::rvalue(value, IrType::I1)
            }
            TokenKind::Tilde => {
                let value = self.builder.create_not(IrType::I32, operand.value);
                Lowered::rvalue(value, IrType::I32)
            }
            other => {
                self.error(
                    &expr.location,
                    format!("cannot lower unary operator '{other}'"),
                    codes::CG_INVALID_BINARY_OP,
                );
                Lowered::RValue(operand)
            }
        }
    }

    /// Pre-increment yields the lvalue; post-increment yields the old
    /// value.
    fn lower_incdec(&mut self, expr: &UnaryExpr) -> Lowered {
        let (addr, ty) = match self.lower_expr(&expr.operand) {
            Lowered::LValue { addr, ty } => (addr, ty),
            Lowered::RValue(rv) => {
                self.error(
                    expr.operand.location(),
                    "increment/decrement needs an assignable operand",
                    codes::CG_NOT_AN_LVALUE,
                );
                return Lowered::RValue(rv);
            }
        };

        let old = self.builder.create_load(ty.clone(), addr.clone());
        let one = if ty.is_float() {
            Value::Float(1.0)
        } else {
            Value::Int(1)
        };
        let op = match (expr.op, ty.is_float()) {
            (TokenKind::PlusPlus, true) => BinOp::FAdd,
            (TokenKind::PlusPlus, false) => BinOp::Add,
            (_, true) => BinOp::FSub,
            (_, false) => BinOp::Sub,
        };
        let new = self.builder.create_binary(op, ty.clone(), old.clone(), one);
        self.builder.create_store(ty.clone(), new, addr.clone());

        if expr.prefix {
            Lowered::LValue { addr, ty }
        } else {
            Lowered::rvalue(old, ty)
        }
    }

    fn lower_address_of(
        &mut self,
        operand: &Expr,
        location: &crate::location::SourceLocation,
    ) -> Lowered {
        match self.lower_expr(operand) {
            Lowered::LValue { addr, ty } => Lowered::rvalue(addr, IrType::ptr_to(ty)),
            Lowered::RValue(rv) => {
                self.error(
                    location,
                    "cannot take the address of a temporary value",
                    codes::CG_NOT_AN_LVALUE,
                );
                Lowered::RValue(rv)
            }
        }
    }

    fn lower_assignment(&mut self, expr: &AssignmentExpr) -> Lowered {
        let (addr, ty) = match self.lower_expr(&expr.target) {
            Lowered::LValue { addr, ty } => (addr, ty),
            Lowered::RValue(rv) => {
                self.error(
                    expr.target.location(),
                    "assignment target must be an lvalue",
                    codes::CG_NOT_AN_LVALUE,
                );
                return Lowered::RValue(rv);
            }
        };

        if expr.op == TokenKind::Equals {
            let value = self.lower_expr_rvalue(&expr.value);
            self.builder
                .create_store(ty.clone(), value.value.clone(), addr);
            return Lowered::RValue(Rv {
                value: value.value,
                ty,
            });
        }

        // Compound assignment: load, apply, store back.
        let current = self.builder.create_load(ty.clone(), addr.clone());
        let rhs = self.lower_expr_rvalue(&expr.value);
        let float = ty.is_float();
        let op = match (expr.op, float) {
            (TokenKind::PlusEquals, true) => BinOp::FAdd,
            (TokenKind::PlusEquals, false) => BinOp::Add,
            (TokenKind::MinusEquals, true) => BinOp::FSub,
            (TokenKind::MinusEquals, false) => BinOp::Sub,
            (TokenKind::StarEquals, true) => BinOp::FMul,
            (TokenKind::StarEquals, false) => BinOp::Mul,
            (TokenKind::SlashEquals, true) => BinOp::FDiv,
            (TokenKind::SlashEquals, false) => BinOp::Div,
            _ => BinOp::Rem,
        };
        let new = self
            .builder
            .create_binary(op, ty.clone(), current, rhs.value);
        self.builder
            .create_store(ty.clone(), new.clone(), addr);
        Lowered::rvalue(new, ty)
    }

    fn lower_conditional(&mut self, expr: &ConditionalExpr) -> Lowered {
        // The result slot must dominate both arms, so it is allocated in
        // the current block with the arm type inferred up front.
        let result_ty = self.expr_type(&expr.then_expr);
        let result = self.builder.create_alloca("ternary", result_ty.clone());

        let cond = self.lower_condition(&expr.condition);
        let then_label = self.builder.create_block("ternary.then");
        let else_label = self.builder.create_block("ternary.else");
        let end_label = self.builder.create_block("ternary.end");
        self.builder.create_cond_br(cond, &then_label, &else_label);

        self.builder.set_insertion_block(&then_label);
        let then_rv = self.lower_expr_rvalue(&expr.then_expr);
        self.builder
            .create_store(result_ty.clone(), then_rv.value, result.clone());
        self.builder.create_br(&end_label);

        self.builder.set_insertion_block(&else_label);
        let else_rv = self.lower_expr_rvalue(&expr.else_expr);
        self.builder
            .create_store(result_ty.clone(), else_rv.value, result.clone());
        self.builder.create_br(&end_label);

        self.builder.set_insertion_block(&end_label);
        let value = self.builder.create_load(result_ty.clone(), result);
        Lowered::rvalue(value, result_ty)
    }

    /// Best-effort type of an expression without emitting any code, for
    /// the spots that need a slot type before the value may be computed.
    /// Answers come from the same slot, global, signature, and layout
    /// tables lowering itself uses; the fallback is the machine word.
    fn expr_type(&self, expr: &Expr) -> IrType {
        match expr {
            Expr::Literal(lit) => match lit.kind {
                LiteralKind::Number if lit.text.contains('.') => IrType::F32,
                LiteralKind::Number => IrType::I32,
                LiteralKind::String => IrType::ptr_to(IrType::I8),
                LiteralKind::Bool => IrType::I1,
                LiteralKind::Null => IrType::ptr_to(IrType::I8),
            },
            Expr::Identifier(ident) => {
                if let Some(slot) = self.lookup_local(&ident.name) {
                    slot.ty.clone()
                } else if let Some(slot) = self.lookup_global(&ident.name) {
                    slot.ty.clone()
                } else if let Some((ret, params)) = self.builder.function_signature(&ident.name) {
                    IrType::ptr_to(IrType::Func {
                        ret: Box::new(ret),
                        params,
                        varargs: false,
                    })
                } else {
                    IrType::I32
                }
            }
            Expr::Binary(e) => {
                if e.op.is_comparison_op()
                    || e.op == TokenKind::AmpersandAmpersand
                    || e.op == TokenKind::PipePipe
                {
                    IrType::I1
                } else if self.expr_type(&e.left).is_float() || self.expr_type(&e.right).is_float()
                {
                    IrType::F32
                } else {
                    IrType::I32
                }
            }
            Expr::Unary(e) => match e.op {
                TokenKind::Exclaim => IrType::I1,
                TokenKind::Tilde => IrType::I32,
                TokenKind::At => IrType::ptr_to(self.expr_type(&e.operand)),
                TokenKind::Star => match self.expr_type(&e.operand) {
                    IrType::Ptr(inner) => *inner,
                    _ => IrType::I32,
                },
                _ => self.expr_type(&e.operand),
            },
            Expr::Assignment(e) => self.expr_type(&e.target),
            Expr::Conditional(e) => self.expr_type(&e.then_expr),
            Expr::Call(e) => match &*e.callee {
                Expr::Identifier(ident) => self
                    .builder
                    .function_signature(&ident.name)
                    .map(|(ret, _)| ret)
                    .unwrap_or(IrType::I32),
                Expr::Member(member) => match &*member.object {
                    Expr::Identifier(ns) => self
                        .builder
                        .function_signature(&format!("{}.{}", ns.name, member.member))
                        .map(|(ret, _)| ret)
                        .unwrap_or(IrType::I32),
                    _ => IrType::I32,
                },
                _ => IrType::I32,
            },
            Expr::Member(e) => {
                if let Expr::Identifier(ident) = &*e.object {
                    let key = format!("{}.{}", ident.name, e.member);
                    if self.enum_consts.contains_key(&key) {
                        return IrType::I32;
                    }
                    if let Some(slot) = self.lookup_global(&key) {
                        return slot.ty.clone();
                    }
                }
                if let IrType::Ptr(inner) = self.expr_type(&e.object) {
                    if let IrType::Named(class_name) = &*inner {
                        if let Some(field) = self
                            .layouts
                            .get(class_name)
                            .and_then(|layout| layout.fields.get(&e.member))
                        {
                            return field.ty.clone();
                        }
                    }
                }
                IrType::I32
            }
            Expr::Index(e) => match self.expr_type(&e.object) {
                IrType::Ptr(inner) => *inner,
                _ => IrType::I32,
            },
            Expr::ArrayLiteral(e) => {
                let elem = e
                    .elements
                    .first()
                    .map(|element| self.expr_type(element))
                    .unwrap_or(IrType::I32);
                IrType::ptr_to(elem)
            }
            Expr::This(_) => IrType::ptr_to(IrType::I8),
            Expr::New(e) => IrType::ptr_to(IrType::Named(e.class_name.clone())),
            Expr::Cast(e) => self.lower_type(&e.target_type),
            Expr::CompileTime(e) => match e.op {
                CompileTimeOp::Typeof => IrType::ptr_to(IrType::I8),
                CompileTimeOp::ConstExpr => self.expr_type(&e.operand),
                _ => IrType::I32,
            },
            Expr::PointerOf(e) => IrType::ptr_to(self.expr_type(&e.operand)),
            Expr::Function(e) => {
                let params = e.params.iter().map(|p| self.lower_type(&p.ty)).collect();
                let ret = e
                    .return_type
                    .as_ref()
                    .map(|t| self.lower_type(t))
                    .unwrap_or(IrType::Void);
                IrType::ptr_to(IrType::Func {
                    ret: Box::new(ret),
                    params,
                    varargs: false,
                })
            }
        }
    }

    fn lower_call(&mut self, expr: &CallExpr) -> Lowered {
        let callee_name = match &*expr.callee {
            Expr::Identifier(ident) => ident.name.clone(),
            Expr::Member(member) => {
                if let Expr::Identifier(ns) = &*member.object {
                    let qualified = format!("{}.{}", ns.name, member.member);
                    if self.builder.function_signature(&qualified).is_some() {
                        qualified
                    } else {
                        self.unsupported(&expr.location, "method call");
                        return Lowered::rvalue(Value::Int(0), IrType::I32);
                    }
                } else {
                    self.unsupported(&expr.location, "method call");
                    return Lowered::rvalue(Value::Int(0), IrType::I32);
                }
            }
            _ => {
                self.unsupported(&expr.location, "indirect call");
                return Lowered::rvalue(Value::Int(0), IrType::I32);
            }
        };

        let Some((ret, param_tys)) = self.builder.function_signature(&callee_name) else {
            self.error(
                &expr.location,
                format!("function not found: {callee_name}"),
                codes::CG_FUNCTION_NOT_FOUND,
            );
            return Lowered::rvalue(Value::Int(0), IrType::I32);
        };

        let varargs = self
            .builder
            .external(&callee_name)
            .is_some_and(|e| e.varargs);
        if !varargs && param_tys.len() != expr.arguments.len() {
            self.error(
                &expr.location,
                format!(
                    "function {callee_name} expects {} argument(s), got {}",
                    param_tys.len(),
                    expr.arguments.len()
                ),
                codes::CG_ARITY_MISMATCH,
            );
            return Lowered::rvalue(Value::Int(0), IrType::I32);
        }

        let mut args = Vec::with_capacity(expr.arguments.len());
        for (i, arg) in expr.arguments.iter().enumerate() {
            let rv = self.lower_expr_rvalue(arg);
            let ty = param_tys.get(i).cloned().unwrap_or(rv.ty.clone());
            args.push((ty, rv.value));
        }

        match self.builder.create_call(ret.clone(), &callee_name, args) {
            Some(value) => Lowered::rvalue(value, ret),
            None => Lowered::rvalue(Value::Int(0), IrType::Void),
        }
    }

    fn lower_member(&mut self, expr: &MemberExpr) -> Lowered {
        if let Expr::Identifier(ident) = &*expr.object {
            // Enum constants fold to their integral value.
            let key = format!("{}.{}", ident.name, expr.member);
            if let Some(&value) = self.enum_consts.get(&key) {
                return Lowered::rvalue(Value::Int(value), IrType::I32);
            }
            // Namespace members are ordinary globals/functions with
            // qualified names.
            if let Some(slot) = self.lookup_global(&key) {
                return Lowered::LValue {
                    addr: slot.addr.clone(),
                    ty: slot.ty.clone(),
                };
            }
            if let Some((ret, params)) = self.builder.function_signature(&key) {
                let ty = IrType::ptr_to(IrType::Func {
                    ret: Box::new(ret),
                    params,
                    varargs: false,
                });
                return Lowered::rvalue(Value::Global(key), ty);
            }
        }

        // Field access through an object pointer: base + field offset.
        let object = self.lower_expr_rvalue(&expr.object);
        let class_name = match &object.ty {
            IrType::Ptr(inner) => match &**inner {
                IrType::Named(name) => Some(name.clone()),
                _ => None,
            },
            _ => None,
        };
        let Some(class_name) = class_name else {
            self.unsupported(&expr.location, "member access on this value");
            return Lowered::rvalue(Value::Int(0), IrType::I32);
        };
        let Some(field) = self
            .layouts
            .get(&class_name)
            .and_then(|layout| layout.fields.get(&expr.member))
            .cloned()
        else {
            self.error(
                &expr.location,
                format!("no field '{}' in class {class_name}", expr.member),
                codes::CG_UNSUPPORTED,
            );
            return Lowered::rvalue(Value::Int(0), IrType::I32);
        };

        let addr = self.builder.create_binary(
            BinOp::Add,
            IrType::I64,
            object.value,
            Value::Int(field.offset),
        );
        Lowered::LValue {
            addr,
            ty: field.ty,
        }
    }

    fn lower_index(&mut self, expr: &IndexExpr) -> Lowered {
        let base = self.lower_expr_rvalue(&expr.object);
        let index = self.lower_expr_rvalue(&expr.index);
        let elem_ty = match &base.ty {
            IrType::Ptr(inner) => (**inner).clone(),
            _ => {
                self.unsupported(expr.object.location(), "indexing this value");
                IrType::I32
            }
        };
        let addr = self.element_address(base.value, index.value, &elem_ty);
        Lowered::LValue { addr, ty: elem_ty }
    }

    /// `base + index * sizeof(elem)` as i64 pointer arithmetic.
    pub(crate) fn element_address(&mut self, base: Value, index: Value, elem_ty: &IrType) -> Value {
        let offset = self.builder.create_binary(
            BinOp::Mul,
            IrType::I64,
            index,
            Value::Int(Self::size_of(elem_ty)),
        );
        self.builder
            .create_binary(BinOp::Add, IrType::I64, base, offset)
    }

    /// Array literals allocate their backing store and fill it in order;
    /// the result is the base pointer.
    pub(crate) fn lower_array_literal(&mut self, expr: &ArrayLiteralExpr) -> Rv {
        let elements: Vec<Rv> = expr
            .elements
            .iter()
            .map(|e| self.lower_expr_rvalue(e))
            .collect();
        let elem_ty = elements
            .first()
            .map(|rv| rv.ty.clone())
            .unwrap_or(IrType::I32);
        let elem_size = Self::size_of(&elem_ty);
        let total = elem_size * expr.elements.len().max(1) as i64;

        let base = self
            .builder
            .create_call(
                IrType::ptr_to(IrType::I8),
                "malloc",
                vec![(IrType::I64, Value::Int(total))],
            )
            .expect("malloc returns a value");

        for (i, element) in elements.into_iter().enumerate() {
            let addr = self.element_address(base.clone(), Value::Int(i as i64), &elem_ty);
            self.builder.create_store(elem_ty.clone(), element.value, addr);
        }

        Rv {
            value: base,
            ty: IrType::ptr_to(elem_ty),
        }
    }

    fn lower_new(&mut self, expr: &NewExpr) -> Lowered {
        // Argument side effects still happen even though constructor
        // bodies are not lowered.
        for arg in &expr.arguments {
            self.lower_expr(arg);
        }
        let size = self
            .layouts
            .get(&expr.class_name)
            .map(|layout| layout.size)
            .unwrap_or(8);
        let raw = self
            .builder
            .create_call(
                IrType::ptr_to(IrType::I8),
                "malloc",
                vec![(IrType::I64, Value::Int(size))],
            )
            .expect("malloc returns a value");
        Lowered::rvalue(raw, IrType::ptr_to(IrType::Named(expr.class_name.clone())))
    }

    /// Casts re-type the value; representation changes are left to the
    /// back-end.
    fn lower_cast(&mut self, expr: &CastExpr) -> Lowered {
        let rv = self.lower_expr_rvalue(&expr.expr);
        let target = self.lower_type(&expr.target_type);
        Lowered::rvalue(rv.value, target)
    }

    fn lower_compile_time(&mut self, expr: &CompileTimeExpr) -> Lowered {
        let lowered = self.lower_expr(&expr.operand);
        let ty = lowered.ty().clone();
        match expr.op {
            CompileTimeOp::Sizeof => Lowered::rvalue(Value::Int(Self::size_of(&ty)), IrType::I32),
            CompileTimeOp::Alignof => {
                let align = Self::size_of(&ty).clamp(1, 8);
                Lowered::rvalue(Value::Int(align), IrType::I32)
            }
            CompileTimeOp::Typeof => {
                let name = self.builder.create_global_string(&ty.to_string());
                Lowered::rvalue(name, IrType::ptr_to(IrType::I8))
            }
            CompileTimeOp::ConstExpr => {
                let rv = self.load(lowered);
                Lowered::RValue(rv)
            }
        }
    }

    /// Function expressions lower to free functions with no environment;
    /// free-variable references are rejected, not captured.
    fn lower_function_expr(&mut self, expr: &FunctionExpr) -> Lowered {
        let name = self.next_lambda_name();
        let params: Vec<(String, IrType)> = expr
            .params
            .iter()
            .map(|p| (p.name.clone(), self.lower_type(&p.ty)))
            .collect();
        let ret = expr
            .return_type
            .as_ref()
            .map(|t| self.lower_type(t))
            .unwrap_or(IrType::Void);

        let saved_position = self.builder.insertion_position();
        let saved_ret = mem::replace(&mut self.current_ret, ret.clone());
        let saved_loops = mem::take(&mut self.loops);
        let outer_scopes = mem::take(&mut self.scopes);
        self.lambda_outer.push(outer_scopes);
        self.scopes.push(HashMap::new());

        self.builder.create_function(&name, params.clone(), ret.clone());
        let entry = self.builder.create_block("entry");
        self.builder.set_insertion_block(&entry);
        for (param_name, param_ty) in &params {
            let slot = self.builder.create_alloca(param_name, param_ty.clone());
            self.builder.create_store(
                param_ty.clone(),
                Value::Param(param_name.clone()),
                slot.clone(),
            );
            self.declare_local(
                param_name,
                Slot {
                    addr: slot,
                    ty: param_ty.clone(),
                    array_len: None,
                },
            );
        }
        for stmt in &expr.body.statements {
            self.lower_stmt(stmt);
        }
        self.emit_default_return();

        self.scopes = self.lambda_outer.pop().unwrap_or_default();
        self.loops = saved_loops;
        self.current_ret = saved_ret;
        if let Some((function, block)) = saved_position {
            self.builder.restore_insertion_position(&function, &block);
        }

        let ty = IrType::ptr_to(IrType::Func {
            ret: Box::new(ret),
            params: params.into_iter().map(|(_, t)| t).collect(),
            varargs: false,
        });
        Lowered::rvalue(Value::Global(name), ty)
    }
}
