mod expr;
mod stmt;

use std::collections::HashMap;

use crate::ast::*;
use crate::builder::Builder;
use crate::diag::{codes, DiagCode, Reporter};
use crate::ir::{IrType, Module, Value};
use crate::location::SourceLocation;
use crate::options::Options;
use crate::token::TokenKind;

/// Lower a checked program to an IR module.
///
/// Lowering is total: constructs it cannot express become diagnostics and
/// safe placeholders, never panics, so a driver that runs it on an
/// erroneous program still gets a printable module back.
pub fn lower(program: &Program, options: &Options, reporter: &mut Reporter) -> Module {
    let mut lowerer = Lowerer::new(options, reporter);
    lowerer.lower_program(program);
    lowerer.builder.finish()
}

/// A named stack slot (or global cell) visible in the current function.
#[derive(Debug, Clone)]
pub(crate) struct Slot {
    pub addr: Value,
    pub ty: IrType,
    /// Element count when this slot holds a statically sized array.
    pub array_len: Option<usize>,
}

#[derive(Debug, Clone)]
pub(crate) struct LoopTargets {
    pub continue_label: Option<String>,
    pub break_label: String,
}

#[derive(Debug, Clone)]
pub(crate) struct FieldLayout {
    pub ty: IrType,
    pub offset: i64,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct ClassLayout {
    pub fields: HashMap<String, FieldLayout>,
    pub size: i64,
}

pub(crate) struct Lowerer<'r> {
    pub(crate) builder: Builder,
    pub(crate) reporter: &'r mut Reporter,
    /// Lexical scope stack of the function currently being lowered.
    pub(crate) scopes: Vec<HashMap<String, Slot>>,
    pub(crate) loops: Vec<LoopTargets>,
    pub(crate) current_ret: IrType,
    /// Saved outer scope stacks while a function expression body is
    /// lowered; used to tell a capture attempt from a plain unknown name.
    pub(crate) lambda_outer: Vec<Vec<HashMap<String, Slot>>>,
    pub(crate) globals: HashMap<String, Slot>,
    pub(crate) enum_consts: HashMap<String, i64>,
    pub(crate) layouts: HashMap<String, ClassLayout>,
    lambda_counter: usize,
}

impl<'r> Lowerer<'r> {
    fn new(options: &Options, reporter: &'r mut Reporter) -> Self {
        Lowerer {
            builder: Builder::new(options.module_name.clone()),
            reporter,
            scopes: Vec::new(),
            loops: Vec::new(),
            current_ret: IrType::Void,
            lambda_outer: Vec::new(),
            globals: HashMap::new(),
            enum_consts: HashMap::new(),
            layouts: HashMap::new(),
            lambda_counter: 0,
        }
    }

    fn lower_program(&mut self, program: &Program) {
        self.declare_runtime_externals();

        // Type layouts and enum constants first: function bodies may
        // reference classes and enums declared later in the file.
        for item in &program.items {
            if let Item::Decl(decl) = item {
                self.collect_type_info(decl, "");
            }
        }

        // Declarations lower in source order; loose statements are
        // buffered for the synthesized entry point.
        let mut buffered: Vec<&Stmt> = Vec::new();
        for item in &program.items {
            match item {
                Item::Decl(decl) => self.lower_top_level_decl(decl, ""),
                Item::Stmt(stmt) => match stmt {
                    Stmt::Expr(_) | Stmt::Assembly(_) => buffered.push(stmt),
                    other => {
                        self.reporter.warning(
                            other.location().clone(),
                            "unsupported top-level statement; only expression and assembly \
                             statements run before main",
                        );
                    }
                },
            }
        }

        // A user-provided main (defined or even just declared) suppresses
        // the synthesized one; the module must carry exactly one.
        if self.builder.function_signature("main").is_none() {
            self.create_default_main(&buffered);
        }
    }

    /// Stubs every module can rely on, declared before any user code.
    fn declare_runtime_externals(&mut self) {
        let char_ptr = IrType::ptr_to(IrType::I8);
        self.builder
            .declare_external("printf", IrType::I32, vec![char_ptr.clone()], true);
        self.builder
            .declare_external("puts", IrType::I32, vec![char_ptr.clone()], false);
        self.builder
            .declare_external("malloc", char_ptr.clone(), vec![IrType::I64], false);
        self.builder
            .declare_external("free", IrType::Void, vec![char_ptr], false);
    }

    fn collect_type_info(&mut self, decl: &Decl, prefix: &str) {
        match decl {
            Decl::Class(class) => {
                let mut layout = ClassLayout::default();
                for member in &class.members {
                    if let ClassMember::Field(field) = member {
                        let ty = field
                            .ty
                            .as_ref()
                            .map(|t| self.lower_type(t))
                            .unwrap_or(IrType::I32);
                        let size = Self::size_of(&ty);
                        layout.fields.insert(
                            field.name.clone(),
                            FieldLayout {
                                ty,
                                offset: layout.size,
                            },
                        );
                        layout.size += size;
                    }
                }
                // An empty class still occupies one byte so `new` never
                // allocates zero.
                if layout.size == 0 {
                    layout.size = 1;
                }
                self.layouts.insert(class.name.clone(), layout);
            }
            Decl::Enum(en) => {
                let mut next = 0i64;
                for member in &en.members {
                    let value = match &member.value {
                        Some(Expr::Literal(lit)) if lit.kind == LiteralKind::Number => {
                            lit.text.parse::<i64>().unwrap_or(next)
                        }
                        _ => next,
                    };
                    self.enum_consts
                        .insert(format!("{}{}.{}", prefix, en.name, member.name), value);
                    next = value + 1;
                }
            }
            Decl::Namespace(ns) => {
                let inner = format!("{}{}.", prefix, ns.name);
                for decl in &ns.declarations {
                    self.collect_type_info(decl, &inner);
                }
            }
            _ => {}
        }
    }

    fn lower_top_level_decl(&mut self, decl: &Decl, prefix: &str) {
        match decl {
            Decl::Function(func) => self.lower_function(func, prefix),
            Decl::Var(var) => self.lower_global_var(var, prefix),
            Decl::Namespace(ns) => {
                let inner = format!("{}{}.", prefix, ns.name);
                for decl in &ns.declarations {
                    self.lower_top_level_decl(decl, &inner);
                }
            }
            // Classes, interfaces, enums and typedefs shape types and
            // constants; they emit no code of their own.
            Decl::Class(_) | Decl::Interface(_) | Decl::Enum(_) | Decl::Typedef(_) => {}
        }
    }

    pub(crate) fn lower_function(&mut self, func: &FunctionDecl, prefix: &str) {
        let name = format!("{prefix}{}", func.name);
        let params: Vec<(String, IrType)> = func
            .params
            .iter()
            .map(|p| (p.name.clone(), self.lower_type(&p.ty)))
            .collect();
        let ret = func
            .return_type
            .as_ref()
            .map(|t| self.lower_type(t))
            .unwrap_or(IrType::Void);

        if func.body.is_none() {
            self.builder.declare_external(
                name,
                ret,
                params.into_iter().map(|(_, t)| t).collect(),
                false,
            );
            return;
        }

        self.builder.create_function(&name, params.clone(), ret.clone());
        let entry = self.builder.create_block("entry");
        self.builder.set_insertion_block(&entry);

        self.scopes.clear();
        self.scopes.push(HashMap::new());
        self.loops.clear();
        self.current_ret = ret.clone();

        // Every parameter gets a stack slot so it can be assigned to and
        // have its address taken like any local.
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

        if let Some(body) = &func.body {
            for stmt in &body.statements {
                self.lower_stmt(stmt);
            }
        }

        self.emit_default_return();
        self.scopes.clear();
    }

    /// A function that falls off the end returns void or a zero value of
    /// its return type.
    pub(crate) fn emit_default_return(&mut self) {
        if self.builder.current_block_terminated() {
            return;
        }
        let ret = self.current_ret.clone();
        let value = match &ret {
            IrType::Void => None,
            other => Some(Self::zero_value(other)),
        };
        self.builder.create_ret(ret, value);
    }

    pub(crate) fn zero_value(ty: &IrType) -> Value {
        match ty {
            IrType::F32 => Value::Float(0.0),
            IrType::I1 => Value::Bool(false),
            IrType::Ptr(_) | IrType::Named(_) | IrType::Func { .. } => Value::Null,
            _ => Value::Int(0),
        }
    }

    /// Global variables evaluate their initializer in a throwaway
    /// function context; only constant-foldable results survive.
    fn lower_global_var(&mut self, var: &VarDecl, prefix: &str) {
        let name = format!("{prefix}{}", var.name);
        let mut ty = var
            .ty
            .as_ref()
            .map(|t| self.lower_type(t))
            .unwrap_or(IrType::I32);

        let mut init = Self::zero_value(&ty);
        if let Some(initializer) = &var.initializer {
            self.builder
                .create_function("__global_init", Vec::new(), IrType::Void);
            let entry = self.builder.create_block("entry");
            self.builder.set_insertion_block(&entry);
            self.scopes.push(HashMap::new());

            let lowered = self.lower_expr_rvalue(initializer);
            if matches!(
                lowered.value,
                Value::Int(_) | Value::Float(_) | Value::Bool(_) | Value::Null | Value::Str(_)
            ) {
                init = lowered.value;
                if var.ty.is_none() {
                    ty = lowered.ty;
                }
            } else {
                self.reporter.warning(
                    var.location.clone(),
                    format!("initializer of global '{name}' is not a constant; defaulting to zero"),
                );
            }

            self.scopes.pop();
            self.builder.discard_function("__global_init");
        }

        self.builder.create_global(&name, ty.clone(), init, var.is_const);
        self.globals.insert(
            name.clone(),
            Slot {
                addr: Value::Global(name),
                ty,
                array_len: None,
            },
        );
    }

    /// The synthesized entry point: buffered top-level statements in
    /// source order, then `ret i32 0`.
    fn create_default_main(&mut self, buffered: &[&Stmt]) {
        self.builder
            .create_function("main", Vec::new(), IrType::I32);
        let entry = self.builder.create_block("entry");
        self.builder.set_insertion_block(&entry);

        self.scopes.clear();
        self.scopes.push(HashMap::new());
        self.loops.clear();
        self.current_ret = IrType::I32;

        for stmt in buffered {
            self.lower_stmt(stmt);
        }

        if !self.builder.current_block_terminated() {
            self.builder.create_ret(IrType::I32, Some(Value::Int(0)));
        }
        self.scopes.clear();
    }

    // -----------------------------------------------------------------
    // Types
    // -----------------------------------------------------------------

    /// Map a source type onto its IR representation. Class instances are
    /// handled by reference, so a named type lowers to a pointer to its
    /// opaque struct.
    pub(crate) fn lower_type(&self, ty: &TypeExpr) -> IrType {
        match ty {
            TypeExpr::Primitive(p) => match p.keyword {
                TokenKind::Void => IrType::Void,
                TokenKind::Int => IrType::I32,
                TokenKind::Float => IrType::F32,
                TokenKind::Boolean => IrType::I1,
                TokenKind::String => IrType::ptr_to(IrType::I8),
                _ => IrType::I32,
            },
            TypeExpr::Named(n) => {
                if self.layouts.contains_key(&n.name) {
                    IrType::ptr_to(IrType::Named(n.name.clone()))
                } else {
                    // Typedefs, generic parameters, and forward names fall
                    // back to the machine word.
                    IrType::I32
                }
            }
            TypeExpr::Qualified(q) => {
                let last = q.segments.last().map(String::as_str).unwrap_or("");
                if self.layouts.contains_key(last) {
                    IrType::ptr_to(IrType::Named(last.to_string()))
                } else {
                    IrType::I32
                }
            }
            TypeExpr::Array(a) => IrType::ptr_to(self.lower_type(&a.element)),
            TypeExpr::Pointer(p) => IrType::ptr_to(self.lower_type(&p.base)),
            TypeExpr::Reference(r) => IrType::ptr_to(self.lower_type(&r.base)),
            TypeExpr::Function(f) => IrType::ptr_to(IrType::Func {
                ret: Box::new(self.lower_type(&f.return_type)),
                params: f.params.iter().map(|p| self.lower_type(p)).collect(),
                varargs: false,
            }),
            TypeExpr::Template(t) => self.lower_type(&t.base),
            TypeExpr::Smart(s) => IrType::ptr_to(self.lower_type(&s.pointee)),
            // The left arm stands in for the whole union; the checker owns
            // union soundness.
            TypeExpr::Union(u) => self.lower_type(&u.left),
            TypeExpr::BuiltinConstraint(_) => IrType::I32,
        }
    }

    pub(crate) fn size_of(ty: &IrType) -> i64 {
        match ty {
            IrType::Void => 0,
            IrType::I1 | IrType::I8 => 1,
            IrType::I32 | IrType::F32 => 4,
            IrType::I64 | IrType::Ptr(_) | IrType::Func { .. } => 8,
            IrType::Named(_) => 8,
        }
    }

    // -----------------------------------------------------------------
    // Scope helpers
    // -----------------------------------------------------------------

    pub(crate) fn declare_local(&mut self, name: &str, slot: Slot) {
        if let Some(frame) = self.scopes.last_mut() {
            frame.insert(name.to_string(), slot);
        }
    }

    pub(crate) fn lookup_local(&self, name: &str) -> Option<&Slot> {
        self.scopes.iter().rev().find_map(|frame| frame.get(name))
    }

    pub(crate) fn lookup_global(&self, name: &str) -> Option<&Slot> {
        self.globals.get(name)
    }

    /// True when `name` is visible in the scopes of the enclosing
    /// function while a function expression is being lowered.
    pub(crate) fn is_outer_binding(&self, name: &str) -> bool {
        self.lambda_outer
            .last()
            .is_some_and(|frames| frames.iter().any(|f| f.contains_key(name)))
    }

    pub(crate) fn next_lambda_name(&mut self) -> String {
        let name = format!("__lambda.{}", self.lambda_counter);
        self.lambda_counter += 1;
        name
    }

    pub(crate) fn error(&mut self, location: &SourceLocation, message: impl Into<String>, code: DiagCode) {
        self.reporter.error_with_code(location.clone(), message, code);
    }

    pub(crate) fn unsupported(&mut self, location: &SourceLocation, what: &str) {
        self.error(
            location,
            format!("{what} is not supported by the IR lowering"),
            codes::CG_UNSUPPORTED,
        );
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::lexer;
    use crate::parser;
    use crate::typecheck;

    /// Full pipeline up to IR text; asserts the front half is clean.
    pub(crate) fn lower_source(source: &str) -> (String, Reporter) {
        let mut reporter = Reporter::new();
        let tokens = lexer::lex(source, "t.tsl", &mut reporter);
        let program = parser::parse(tokens, &mut reporter);
        assert!(
            !reporter.has_errors(),
            "parse diagnostics: {:#?}",
            reporter.diagnostics()
        );
        let checked = typecheck::check(&program, &mut reporter);
        assert!(
            checked,
            "check diagnostics: {:#?}",
            reporter.diagnostics()
        );
        let module = lower(&program, &Options::default(), &mut reporter);
        (module.to_string(), reporter)
    }

    pub(crate) fn lower_ok(source: &str) -> String {
        let (text, reporter) = lower_source(source);
        assert!(
            !reporter.has_errors(),
            "lowering diagnostics: {:#?}",
            reporter.diagnostics()
        );
        text
    }

    #[test]
    fn module_declares_runtime_externals_up_front() {
        let text = lower_ok("function f(): void { }");
        assert!(text.contains("declare i32 @printf(i8*, ...)"));
        assert!(text.contains("declare i32 @puts(i8*)"));
        assert!(text.contains("declare i8* @malloc(i64)"));
        assert!(text.contains("declare void @free(i8*)"));
    }

    #[test]
    fn synthesizes_main_when_absent() {
        let text = lower_ok("1 + 2;");
        assert_eq!(text.matches("define i32 @main()").count(), 1);
        assert!(text.contains("ret i32 0"));
    }

    #[test]
    fn does_not_synthesize_main_when_present() {
        let text = lower_ok("function main(): int { return 7; }");
        assert_eq!(text.matches("@main").count(), 1);
        assert!(text.contains("ret i32 7"));
    }

    #[test]
    fn function_without_body_becomes_a_declaration() {
        let text = lower_ok("function putc(c: int): void;");
        assert!(text.contains("declare void @putc(i32)"));
    }

    #[test]
    fn default_return_matches_return_type() {
        let text = lower_ok("function f(): int { }");
        assert!(text.contains("ret i32 0"));
        let text = lower_ok("function g(): void { }");
        assert!(text.contains("ret void"));
        let text = lower_ok("function h(): float { }");
        assert!(text.contains("ret f32 0.0"));
    }

    #[test]
    fn globals_fold_constant_initializers() {
        let text = lower_ok("let answer: int = 42; const tag: string = \"t\";");
        assert!(text.contains("@answer = global i32 42"));
        assert!(text.contains("@tag = constant i8* @.str.0"));
    }

    #[test]
    fn module_name_option_sets_the_module_id() {
        let mut reporter = Reporter::new();
        let tokens = lexer::lex("function f(): void { }", "t.tsl", &mut reporter);
        let program = parser::parse(tokens, &mut reporter);
        let options = Options {
            module_name: "custom_mod".to_string(),
            ..Options::default()
        };
        let module = lower(&program, &options, &mut reporter);
        assert!(module.to_string().contains("; ModuleID = 'custom_mod'"));
    }

    #[test]
    fn namespace_members_get_qualified_names() {
        let text = lower_ok(
            "namespace math { const zero: int = 0; function twice(x: int): int { return x * 2; } }",
        );
        assert!(text.contains("@math.zero = constant i32 0"));
        assert!(text.contains("define i32 @math.twice(i32 %x)"));
    }
}
