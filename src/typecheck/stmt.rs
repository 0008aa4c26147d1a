use std::rc::Rc;

use super::Checker;
use crate::ast::*;
use crate::diag::codes;
use crate::types::Type;

impl Checker<'_> {
    pub(crate) fn check_stmt(&mut self, stmt: &Stmt) -> Rc<Type> {
        match stmt {
            Stmt::Block(block) => self.check_block(block),
            Stmt::Expr(s) => {
                self.check_expr(&s.expr);
                Type::void()
            }
            Stmt::Decl(s) => self.check_decl(&s.decl),
            Stmt::If(s) => self.check_if(s),
            Stmt::While(s) => self.check_while(s),
            Stmt::DoWhile(s) => self.check_do_while(s),
            Stmt::For(s) => self.check_for(s),
            Stmt::ForOf(s) => self.check_for_of(s),
            Stmt::Break(location) => {
                if !self.in_loop {
                    self.error(
                        location,
                        "break statement must be inside a loop",
                        codes::TC_BREAK_OUTSIDE_LOOP,
                    );
                    return Type::error();
                }
                Type::void()
            }
            Stmt::Continue(location) => {
                if !self.in_loop {
                    self.error(
                        location,
                        "continue statement must be inside a loop",
                        codes::TC_CONTINUE_OUTSIDE_LOOP,
                    );
                    return Type::error();
                }
                Type::void()
            }
            Stmt::Return(s) => self.check_return(s),
            Stmt::Try(s) => self.check_try(s),
            Stmt::Throw(s) => {
                self.check_expr(&s.value);
                Type::void()
            }
            Stmt::Switch(s) => self.check_switch(s),
            Stmt::Labeled(s) => self.check_stmt(&s.statement),
            Stmt::Assembly(s) => {
                if s.code.is_empty() {
                    self.error(
                        &s.location,
                        "assembly statement cannot have empty code",
                        codes::TC_INVALID_UNARY_OP,
                    );
                    return Type::error();
                }
                Type::void()
            }
        }
    }

    fn check_block(&mut self, block: &Block) -> Rc<Type> {
        self.scope.enter();
        for stmt in &block.statements {
            self.check_stmt(stmt);
        }
        self.scope.exit();
        Type::void()
    }

    fn require_bool_condition(&mut self, condition: &Expr, construct: &str) {
        let ty = self.check_expr(condition);
        if !ty.is_implicitly_convertible_to(&Type::bool()) {
            self.error(
                condition.location(),
                format!("{construct} condition must be convertible to boolean, got {ty}"),
                codes::TC_INVALID_CONVERSION,
            );
        }
    }

    fn check_loop_body(&mut self, body: &Stmt) {
        let was_in_loop = self.in_loop;
        self.in_loop = true;
        self.check_stmt(body);
        self.in_loop = was_in_loop;
    }

    fn check_if(&mut self, stmt: &IfStmt) -> Rc<Type> {
        self.require_bool_condition(&stmt.condition, "if");
        self.check_stmt(&stmt.then_branch);
        if let Some(else_branch) = &stmt.else_branch {
            self.check_stmt(else_branch);
        }
        Type::void()
    }

    fn check_while(&mut self, stmt: &WhileStmt) -> Rc<Type> {
        self.require_bool_condition(&stmt.condition, "while");
        self.check_loop_body(&stmt.body);
        Type::void()
    }

    fn check_do_while(&mut self, stmt: &DoWhileStmt) -> Rc<Type> {
        self.check_loop_body(&stmt.body);
        self.require_bool_condition(&stmt.condition, "do-while");
        Type::void()
    }

    fn check_for(&mut self, stmt: &ForStmt) -> Rc<Type> {
        self.scope.enter();
        if let Some(init) = &stmt.initializer {
            self.check_stmt(init);
        }
        if let Some(condition) = &stmt.condition {
            self.require_bool_condition(condition, "for loop");
        }
        if let Some(increment) = &stmt.increment {
            self.check_expr(increment);
        }
        self.check_loop_body(&stmt.body);
        self.scope.exit();
        Type::void()
    }

    fn check_for_of(&mut self, stmt: &ForOfStmt) -> Rc<Type> {
        self.scope.enter();

        let iterable_ty = self.check_expr(&stmt.iterable);
        let element_ty = match &*iterable_ty {
            Type::Array(element) => element.clone(),
            Type::Error => Type::error(),
            _ => {
                self.warning(
                    stmt.iterable.location(),
                    format!("for-of requires an iterable type, got {iterable_ty}"),
                );
                Type::error()
            }
        };

        // An explicit binding annotation must accept the element type.
        let binding_ty = match &stmt.binding_type {
            Some(annotation) => {
                let declared = self.resolve_type(annotation);
                if !element_ty.is_assignable_to(&declared) {
                    self.error(
                        &stmt.location,
                        format!("cannot bind {element_ty} element to {declared}"),
                        codes::TC_INVALID_CONVERSION,
                    );
                }
                declared
            }
            None => element_ty,
        };
        self.scope.declare_variable(&stmt.binding, binding_ty);

        self.check_loop_body(&stmt.body);
        self.scope.exit();
        Type::void()
    }

    fn check_return(&mut self, stmt: &ReturnStmt) -> Rc<Type> {
        let returned = match &stmt.value {
            Some(value) => self.check_expr(value),
            None => Type::void(),
        };
        if let Some(expected) = self.return_type.clone() {
            if !returned.is_assignable_to(&expected) {
                self.error(
                    &stmt.location,
                    format!("return value has type {returned}, expected {expected}"),
                    codes::TC_RETURN_MISMATCH,
                );
                return Type::error();
            }
        }
        Type::void()
    }

    fn check_try(&mut self, stmt: &TryStmt) -> Rc<Type> {
        let was_in_try = self.in_try;
        self.in_try = true;
        self.check_block(&stmt.try_block);
        self.in_try = was_in_try;

        for clause in &stmt.catch_clauses {
            self.scope.enter();
            let param_ty = match &clause.param_type {
                Some(ty) => self.resolve_type(ty),
                None => Type::error(),
            };
            self.scope.declare_variable(&clause.param, param_ty);
            for inner in &clause.body.statements {
                self.check_stmt(inner);
            }
            self.scope.exit();
        }

        if let Some(finally_block) = &stmt.finally_block {
            self.check_block(finally_block);
        }
        Type::void()
    }

    fn check_switch(&mut self, stmt: &SwitchStmt) -> Rc<Type> {
        let scrutinee_ty = self.check_expr(&stmt.scrutinee);

        for case in &stmt.cases {
            if let Some(value) = &case.value {
                let case_ty = self.check_expr(value);
                if !case_ty.is_assignable_to(&scrutinee_ty) {
                    self.error(
                        value.location(),
                        format!(
                            "case value has type {case_ty}, expected {scrutinee_ty}"
                        ),
                        codes::TC_INVALID_CONVERSION,
                    );
                }
            }
            // Case bodies get their own scope; the loop flag is set
            // around loop bodies only, so break/continue in a switch
            // still require an enclosing loop.
            self.scope.enter();
            for inner in &case.body {
                self.check_stmt(inner);
            }
            self.scope.exit();
        }
        Type::void()
    }
}
