use std::collections::HashMap;

use super::{LoopTargets, Lowerer, Slot};
use crate::ast::*;
use crate::diag::codes;
use crate::ir::{CmpOp, IrType, Value};

impl Lowerer<'_> {
    pub(crate) fn lower_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Block(block) => {
                self.scopes.push(HashMap::new());
                for inner in &block.statements {
                    self.lower_stmt(inner);
                }
                self.scopes.pop();
            }
            Stmt::Expr(s) => {
                self.lower_expr(&s.expr);
            }
            Stmt::Decl(s) => self.lower_decl_stmt(&s.decl),
            Stmt::If(s) => self.lower_if(s),
            Stmt::While(s) => self.lower_while(s),
            Stmt::DoWhile(s) => self.lower_do_while(s),
            Stmt::For(s) => self.lower_for(s),
            Stmt::ForOf(s) => self.lower_for_of(s),
            Stmt::Break(_) => {
                // A break the checker already rejected lowers to a no-op.
                if let Some(targets) = self.loops.last() {
                    let target = targets.break_label.clone();
                    self.builder.create_br(&target);
                }
            }
            Stmt::Continue(location) => match self.loops.last() {
                Some(LoopTargets {
                    continue_label: Some(label),
                    ..
                }) => {
                    let label = label.clone();
                    self.builder.create_br(&label);
                }
                Some(_) => {
                    self.error(
                        location,
                        "continue is not allowed inside a switch",
                        codes::CG_UNSUPPORTED,
                    );
                }
                None => {}
            },
            Stmt::Return(s) => {
                let ret = self.current_ret.clone();
                match (&s.value, ret.is_void()) {
                    (Some(value), false) => {
                        let rv = self.lower_expr_rvalue(value);
                        self.builder.create_ret(ret, Some(rv.value));
                    }
                    (Some(value), true) => {
                        self.lower_expr(value);
                        self.builder.create_ret(IrType::Void, None);
                    }
                    (None, true) => self.builder.create_ret(IrType::Void, None),
                    (None, false) => {
                        let zero = Self::zero_value(&ret);
                        self.builder.create_ret(ret, Some(zero));
                    }
                }
            }
            Stmt::Try(s) => {
                // No unwinding machinery in the emitted IR: the try body
                // and finalizer run unconditionally, handlers never do.
                self.reporter.warning(
                    s.location.clone(),
                    "catch clauses are not lowered; try and finally bodies run unconditionally",
                );
                self.lower_stmt(&Stmt::Block(s.try_block.clone()));
                if let Some(finally_block) = &s.finally_block {
                    self.lower_stmt(&Stmt::Block(finally_block.clone()));
                }
            }
            Stmt::Throw(s) => {
                self.lower_expr(&s.value);
                self.reporter.warning(
                    s.location.clone(),
                    "throw is not lowered; the thrown value is evaluated and dropped",
                );
            }
            Stmt::Switch(s) => self.lower_switch(s),
            Stmt::Labeled(s) => self.lower_stmt(&s.statement),
            Stmt::Assembly(s) => self.lower_assembly(s),
        }
    }

    fn lower_decl_stmt(&mut self, decl: &Decl) {
        match decl {
            Decl::Var(var) => self.lower_local_var(var),
            other => self.unsupported(other.location(), "nested declaration"),
        }
    }

    fn lower_local_var(&mut self, var: &VarDecl) {
        // Array literals get their element count recorded so for-of can
        // iterate them.
        if let Some(Expr::ArrayLiteral(arr)) = &var.initializer {
            let rv = self.lower_expr_rvalue(var.initializer.as_ref().unwrap());
            let slot_addr = self.builder.create_alloca(&var.name, rv.ty.clone());
            self.builder
                .create_store(rv.ty.clone(), rv.value, slot_addr.clone());
            self.declare_local(
                &var.name,
                Slot {
                    addr: slot_addr,
                    ty: rv.ty,
                    array_len: Some(arr.elements.len()),
                },
            );
            return;
        }

        let annotated = var.ty.as_ref().map(|t| self.lower_type(t));
        let init = var.initializer.as_ref().map(|e| self.lower_expr_rvalue(e));
        let ty = annotated
            .or_else(|| init.as_ref().map(|rv| rv.ty.clone()))
            .unwrap_or(IrType::I32);

        let addr = self.builder.create_alloca(&var.name, ty.clone());
        if let Some(rv) = init {
            self.builder.create_store(ty.clone(), rv.value, addr.clone());
        }
        self.declare_local(
            &var.name,
            Slot {
                addr,
                ty,
                array_len: None,
            },
        );
    }

    fn lower_if(&mut self, stmt: &IfStmt) {
        let cond = self.lower_condition(&stmt.condition);
        let then_label = self.builder.create_block("if.then");
        let else_label = self.builder.create_block("if.else");
        let end_label = self.builder.create_block("if.end");

        self.builder.create_cond_br(cond, &then_label, &else_label);

        self.builder.set_insertion_block(&then_label);
        self.lower_stmt(&stmt.then_branch);
        self.builder.create_br(&end_label);

        self.builder.set_insertion_block(&else_label);
        if let Some(else_branch) = &stmt.else_branch {
            self.lower_stmt(else_branch);
        }
        self.builder.create_br(&end_label);

        self.builder.set_insertion_block(&end_label);
    }

    fn lower_while(&mut self, stmt: &WhileStmt) {
        let cond_label = self.builder.create_block("while.cond");
        let body_label = self.builder.create_block("while.body");
        let end_label = self.builder.create_block("while.end");

        self.builder.create_br(&cond_label);
        self.builder.set_insertion_block(&cond_label);
        let cond = self.lower_condition(&stmt.condition);
        self.builder.create_cond_br(cond, &body_label, &end_label);

        self.loops.push(LoopTargets {
            continue_label: Some(cond_label.clone()),
            break_label: end_label.clone(),
        });
        self.builder.set_insertion_block(&body_label);
        self.lower_stmt(&stmt.body);
        self.builder.create_br(&cond_label);
        self.loops.pop();

        self.builder.set_insertion_block(&end_label);
    }

    fn lower_do_while(&mut self, stmt: &DoWhileStmt) {
        let body_label = self.builder.create_block("do.body");
        let cond_label = self.builder.create_block("do.cond");
        let end_label = self.builder.create_block("do.end");

        self.builder.create_br(&body_label);
        self.loops.push(LoopTargets {
            continue_label: Some(cond_label.clone()),
            break_label: end_label.clone(),
        });
        self.builder.set_insertion_block(&body_label);
        self.lower_stmt(&stmt.body);
        self.builder.create_br(&cond_label);
        self.loops.pop();

        self.builder.set_insertion_block(&cond_label);
        let cond = self.lower_condition(&stmt.condition);
        self.builder.create_cond_br(cond, &body_label, &end_label);

        self.builder.set_insertion_block(&end_label);
    }

    fn lower_for(&mut self, stmt: &ForStmt) {
        self.scopes.push(HashMap::new());
        if let Some(init) = &stmt.initializer {
            self.lower_stmt(init);
        }

        let cond_label = self.builder.create_block("for.cond");
        let body_label = self.builder.create_block("for.body");
        let step_label = self.builder.create_block("for.step");
        let end_label = self.builder.create_block("for.end");

        self.builder.create_br(&cond_label);
        self.builder.set_insertion_block(&cond_label);
        match &stmt.condition {
            Some(condition) => {
                let cond = self.lower_condition(condition);
                self.builder.create_cond_br(cond, &body_label, &end_label);
            }
            None => self.builder.create_br(&body_label),
        }

        self.loops.push(LoopTargets {
            continue_label: Some(step_label.clone()),
            break_label: end_label.clone(),
        });
        self.builder.set_insertion_block(&body_label);
        self.lower_stmt(&stmt.body);
        self.builder.create_br(&step_label);
        self.loops.pop();

        self.builder.set_insertion_block(&step_label);
        if let Some(increment) = &stmt.increment {
            self.lower_expr(increment);
        }
        self.builder.create_br(&cond_label);

        self.builder.set_insertion_block(&end_label);
        self.scopes.pop();
    }

    /// For-of compiles to an index loop; the iterable must have a
    /// statically known element count (array literal or a local array).
    fn lower_for_of(&mut self, stmt: &ForOfStmt) {
        let (base, elem_ty, len) = match self.lower_iterable(&stmt.iterable) {
            Some(parts) => parts,
            None => {
                self.unsupported(
                    stmt.iterable.location(),
                    "for-of over a dynamically sized iterable",
                );
                return;
            }
        };

        self.scopes.push(HashMap::new());
        let index_slot = self.builder.create_alloca("for.of.idx", IrType::I64);
        self.builder
            .create_store(IrType::I64, Value::Int(0), index_slot.clone());

        let cond_label = self.builder.create_block("forof.cond");
        let body_label = self.builder.create_block("forof.body");
        let step_label = self.builder.create_block("forof.step");
        let end_label = self.builder.create_block("forof.end");

        self.builder.create_br(&cond_label);
        self.builder.set_insertion_block(&cond_label);
        let index = self.builder.create_load(IrType::I64, index_slot.clone());
        let in_range = self.builder.create_cmp(
            CmpOp::Lt,
            false,
            IrType::I64,
            index.clone(),
            Value::Int(len as i64),
        );
        self.builder.create_cond_br(in_range, &body_label, &end_label);

        self.builder.set_insertion_block(&body_label);
        let elem_addr = self.element_address(base.clone(), index, &elem_ty);
        self.declare_local(
            &stmt.binding,
            Slot {
                addr: elem_addr,
                ty: elem_ty.clone(),
                array_len: None,
            },
        );

        self.loops.push(LoopTargets {
            continue_label: Some(step_label.clone()),
            break_label: end_label.clone(),
        });
        self.lower_stmt(&stmt.body);
        self.builder.create_br(&step_label);
        self.loops.pop();

        self.builder.set_insertion_block(&step_label);
        let index = self.builder.create_load(IrType::I64, index_slot.clone());
        let next = self.builder.create_binary(
            crate::ir::BinOp::Add,
            IrType::I64,
            index,
            Value::Int(1),
        );
        self.builder.create_store(IrType::I64, next, index_slot);
        self.builder.create_br(&cond_label);

        self.builder.set_insertion_block(&end_label);
        self.scopes.pop();
    }

    /// Base pointer, element type, and static length of an iterable.
    fn lower_iterable(&mut self, iterable: &Expr) -> Option<(Value, IrType, usize)> {
        match iterable {
            Expr::ArrayLiteral(arr) => {
                let rv = self.lower_array_literal(arr);
                let elem_ty = match &rv.ty {
                    IrType::Ptr(inner) => (**inner).clone(),
                    _ => IrType::I32,
                };
                Some((rv.value, elem_ty, arr.elements.len()))
            }
            Expr::Identifier(ident) => {
                let slot = self.lookup_local(&ident.name)?.clone();
                let len = slot.array_len?;
                let elem_ty = match &slot.ty {
                    IrType::Ptr(inner) => (**inner).clone(),
                    _ => IrType::I32,
                };
                let base = self.builder.create_load(slot.ty.clone(), slot.addr);
                Some((base, elem_ty, len))
            }
            _ => None,
        }
    }

    fn lower_switch(&mut self, stmt: &SwitchStmt) {
        let scrutinee = self.lower_expr_rvalue(&stmt.scrutinee);
        let mut next_check = self.builder.create_block("switch.case");
        let end_label = self.builder.create_block("switch.end");

        // Break leaves the switch; continue must target an outer loop.
        self.loops.push(LoopTargets {
            continue_label: None,
            break_label: end_label.clone(),
        });

        self.builder.create_br(&next_check);

        let mut default_case: Option<&SwitchCase> = None;
        for case in &stmt.cases {
            let Some(value) = &case.value else {
                default_case = Some(case);
                continue;
            };
            let body_label = self.builder.create_block("switch.body");
            let check_label = next_check;
            next_check = self.builder.create_block("switch.case");

            self.builder.set_insertion_block(&check_label);
            let case_value = self.lower_expr_rvalue(value);
            let matches = self.builder.create_cmp(
                CmpOp::Eq,
                scrutinee.ty.is_float(),
                scrutinee.ty.clone(),
                scrutinee.value.clone(),
                case_value.value,
            );
            self.builder.create_cond_br(matches, &body_label, &next_check);

            self.builder.set_insertion_block(&body_label);
            self.scopes.push(HashMap::new());
            for inner in &case.body {
                self.lower_stmt(inner);
            }
            self.scopes.pop();
            self.builder.create_br(&end_label);
        }

        // The final check block falls through to the default body.
        self.builder.set_insertion_block(&next_check);
        if let Some(case) = default_case {
            self.scopes.push(HashMap::new());
            for inner in &case.body {
                self.lower_stmt(inner);
            }
            self.scopes.pop();
        }
        self.builder.create_br(&end_label);

        self.loops.pop();
        self.builder.set_insertion_block(&end_label);
    }

    /// `#asm("printf(\"...\")")` becomes a real call to the declared
    /// printf; anything else is embedded as opaque inline assembly.
    fn lower_assembly(&mut self, stmt: &AssemblyStmt) {
        if stmt.code.is_empty() {
            self.error(
                &stmt.location,
                "assembly statement cannot have empty code",
                codes::CG_EMPTY_ASM,
            );
            return;
        }
        if let Some(text) = extract_printf_string(&stmt.code) {
            let resolved = resolve_escapes(&text);
            let format_str = self.builder.create_global_string(&resolved);
            self.builder.create_call(
                IrType::I32,
                "printf",
                vec![(IrType::ptr_to(IrType::I8), format_str)],
            );
            return;
        }
        self.builder.create_inline_asm(&stmt.code);
    }
}

/// Match `printf ( "..." )` and return the raw string between the quotes.
fn extract_printf_string(code: &str) -> Option<String> {
    let rest = code.trim().strip_prefix("printf")?;
    let rest = rest.trim_start().strip_prefix('(')?;
    let rest = rest.trim_start().strip_prefix('"')?;
    let end = rest.rfind('"')?;
    let tail = rest[end + 1..].trim_start();
    let tail = tail.strip_prefix(')')?;
    if !tail.trim().is_empty() {
        return None;
    }
    Some(rest[..end].to_string())
}

/// Resolve the escape sequences the assembly payload may carry.
fn resolve_escapes(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('\\') => out.push('\\'),
            Some('"') => out.push('"'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::super::tests::{lower_ok, lower_source};
    use super::{extract_printf_string, resolve_escapes};

    #[test]
    fn printf_pattern_extraction() {
        assert_eq!(
            extract_printf_string(r#"printf("hi\n")"#),
            Some(r"hi\n".to_string())
        );
        assert_eq!(
            extract_printf_string(r#"  printf ( "spaced" )  "#),
            Some("spaced".to_string())
        );
        assert_eq!(extract_printf_string("mov eax, 1"), None);
        assert_eq!(extract_printf_string(r#"printf("x"); extra"#), None);
    }

    #[test]
    fn escape_resolution() {
        assert_eq!(resolve_escapes(r"hi\n"), "hi\n");
        assert_eq!(resolve_escapes(r"a\tb\\c"), "a\tb\\c");
        assert_eq!(resolve_escapes(r#"say \"hi\""#), "say \"hi\"");
    }

    #[test]
    fn top_level_printf_asm_lands_in_main() {
        let text = lower_ok(r#"#asm("printf(\"hi\\n\")");"#);
        assert!(text.contains("define i32 @main()"));
        assert!(text.contains("@.str.0 = private constant [4 x i8] c\"hi\\0A\\00\""));
        assert!(text.contains("call i32 @printf(i8* @.str.0)"));
        assert!(text.contains("ret i32 0"));
    }

    #[test]
    fn opaque_assembly_is_embedded() {
        let text = lower_ok(r#"function f(): void { #asm("nop"); }"#);
        assert!(text.contains("call void asm sideeffect \"nop\", \"\"()"));
    }

    #[test]
    fn if_else_produces_branches() {
        let text = lower_ok(
            "function f(a: int): int { if (a > 1) { return 1; } else { return 2; } }",
        );
        assert!(text.contains("icmp sgt i32"));
        assert!(text.contains("br i1"));
        assert!(text.contains("if.then"));
        assert!(text.contains("if.else"));
    }

    #[test]
    fn while_loop_shape() {
        let text = lower_ok(
            "function f(): int { let i = 0; while (i < 3) { i = i + 1; } return i; }",
        );
        assert!(text.contains("while.cond"));
        assert!(text.contains("while.body"));
        assert!(text.contains("while.end"));
        assert!(text.contains("icmp slt i32"));
    }

    #[test]
    fn break_and_continue_target_the_loop() {
        let text = lower_ok(
            "function f(): void { while (true) { if (false) { continue; } break; } }",
        );
        assert!(text.contains("br label %while.cond"));
        assert!(text.contains("br label %while.end"));
    }

    #[test]
    fn for_loop_has_a_step_block() {
        let text = lower_ok("function f(): void { for (let i = 0; i < 3; i++) { } }");
        assert!(text.contains("for.cond"));
        assert!(text.contains("for.step"));
    }

    #[test]
    fn for_of_iterates_a_literal_array() {
        let text = lower_ok("function f(): void { for (let e of [1, 2, 3]) { } }");
        assert!(text.contains("forof.cond"));
        assert!(text.contains("icmp slt i64"));
        assert!(text.contains("call i8* @malloc(i64 12)"));
    }

    #[test]
    fn switch_compares_case_by_case() {
        let text = lower_ok(
            "function f(x: int): int {
                switch (x) { case 1: return 10; case 2: return 20; default: return 0; }
             }",
        );
        assert!(text.contains("icmp eq i32"));
        assert!(text.contains("switch.body"));
        assert!(text.contains("switch.end"));
    }

    #[test]
    fn try_finally_lowers_with_a_warning() {
        let (text, reporter) = lower_source(
            "function f(): void { try { } catch (e: int) { } finally { } }",
        );
        assert!(text.contains("define void @f()"));
        assert!(reporter
            .diagnostics()
            .iter()
            .any(|d| d.message.contains("catch clauses are not lowered")));
    }
}
