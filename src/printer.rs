//! Source renderer for the AST.
//!
//! Prints a parsed program back to Tessel syntax. The output normalizes
//! whitespace but preserves structure, so printing a parse result and
//! reparsing it yields the same tree.

use std::fmt::Write;

use crate::ast::*;

pub fn print_program(program: &Program) -> String {
    let mut printer = Printer::new();
    for item in &program.items {
        match item {
            Item::Decl(decl) => printer.decl(decl),
            Item::Stmt(stmt) => printer.stmt(stmt),
        }
    }
    printer.out
}

pub fn print_expr(expr: &Expr) -> String {
    let mut printer = Printer::new();
    printer.expr(expr);
    printer.out
}

struct Printer {
    out: String,
    indent: usize,
}

impl Printer {
    fn new() -> Self {
        Printer {
            out: String::new(),
            indent: 0,
        }
    }

    fn line(&mut self, text: &str) {
        for _ in 0..self.indent {
            self.out.push_str("    ");
        }
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn open(&mut self, text: &str) {
        self.line(text);
        self.indent += 1;
    }

    fn close(&mut self, text: &str) {
        self.indent -= 1;
        self.line(text);
    }

    // -----------------------------------------------------------------
    // Declarations
    // -----------------------------------------------------------------

    fn decl(&mut self, decl: &Decl) {
        match decl {
            Decl::Var(var) => {
                let text = self.var_decl_text(var);
                self.line(&text);
            }
            Decl::Function(func) => self.function_decl(func),
            Decl::Class(class) => self.class_decl(class),
            Decl::Interface(interface) => self.interface_decl(interface),
            Decl::Enum(en) => self.enum_decl(en),
            Decl::Namespace(ns) => {
                self.open(&format!("namespace {} {{", ns.name));
                for inner in &ns.declarations {
                    self.decl(inner);
                }
                self.close("}");
            }
            Decl::Typedef(typedef) => {
                let aliased = type_text(&typedef.aliased);
                self.line(&format!("typedef {} = {};", typedef.name, aliased));
            }
        }
    }

    fn var_decl_text(&mut self, var: &VarDecl) -> String {
        let mut text = String::new();
        match var.storage {
            StorageClass::Auto => {}
            StorageClass::Stack => text.push_str("#stack "),
            StorageClass::Heap => text.push_str("#heap "),
            StorageClass::Static => text.push_str("#static "),
        }
        text.push_str(if var.is_const { "const " } else { "let " });
        text.push_str(&var.name);
        if let Some(ty) = &var.ty {
            let _ = write!(text, ": {}", type_text(ty));
        }
        if let Some(init) = &var.initializer {
            let _ = write!(text, " = {}", expr_text(init));
        }
        text.push(';');
        text
    }

    fn signature_text(
        &mut self,
        name: &str,
        generic_params: &[GenericParam],
        params: &[Param],
        return_type: Option<&TypeExpr>,
    ) -> String {
        let mut text = String::from(name);
        if !generic_params.is_empty() {
            text.push('<');
            for (i, gp) in generic_params.iter().enumerate() {
                if i > 0 {
                    text.push_str(", ");
                }
                text.push_str(&gp.name);
                if !gp.constraints.is_empty() {
                    text.push_str(" extends ");
                    for (j, c) in gp.constraints.iter().enumerate() {
                        if j > 0 {
                            text.push_str(" & ");
                        }
                        text.push_str(&type_text(c));
                    }
                }
            }
            text.push('>');
        }
        text.push('(');
        for (i, param) in params.iter().enumerate() {
            if i > 0 {
                text.push_str(", ");
            }
            text.push_str(&param_text(param));
        }
        text.push(')');
        if let Some(ret) = return_type {
            let _ = write!(text, ": {}", type_text(ret));
        }
        text
    }

    fn function_decl(&mut self, func: &FunctionDecl) {
        let mut head = String::new();
        for modifier in &func.modifiers {
            let _ = write!(head, "{modifier} ");
        }
        head.push_str("function ");
        head.push_str(&self.signature_text(
            &func.name,
            &func.generic_params,
            &func.params,
            func.return_type.as_ref(),
        ));
        if !func.throws.is_empty() {
            head.push_str(" throws ");
            for (i, ty) in func.throws.iter().enumerate() {
                if i > 0 {
                    head.push_str(", ");
                }
                head.push_str(&type_text(ty));
            }
        }
        match &func.body {
            Some(body) => {
                self.open(&format!("{head} {{"));
                for stmt in &body.statements {
                    self.stmt(stmt);
                }
                self.close("}");
            }
            None => self.line(&format!("{head};")),
        }
    }

    fn class_decl(&mut self, class: &ClassDecl) {
        let mut head = String::new();
        for modifier in &class.modifiers {
            let _ = write!(head, "{modifier} ");
        }
        let _ = write!(head, "class {}", class.name);
        if !class.generic_params.is_empty() {
            head.push('<');
            for (i, gp) in class.generic_params.iter().enumerate() {
                if i > 0 {
                    head.push_str(", ");
                }
                head.push_str(&gp.name);
            }
            head.push('>');
        }
        if let Some(base) = &class.base_class {
            let _ = write!(head, " extends {}", type_text(base));
        }
        if !class.interfaces.is_empty() {
            head.push_str(" implements ");
            for (i, ty) in class.interfaces.iter().enumerate() {
                if i > 0 {
                    head.push_str(", ");
                }
                head.push_str(&type_text(ty));
            }
        }
        self.open(&format!("{head} {{"));
        for member in &class.members {
            self.class_member(member);
        }
        self.close("}");
    }

    fn access_prefix(access: AccessModifier) -> &'static str {
        match access {
            AccessModifier::Public => "public ",
            AccessModifier::Private => "private ",
            AccessModifier::Protected => "protected ",
        }
    }

    fn class_member(&mut self, member: &ClassMember) {
        match member {
            ClassMember::Field(field) => {
                let mut text = String::from(Self::access_prefix(field.access));
                if field.is_const {
                    text.push_str("const ");
                }
                text.push_str(&field.name);
                if let Some(ty) = &field.ty {
                    let _ = write!(text, ": {}", type_text(ty));
                }
                if let Some(init) = &field.initializer {
                    let _ = write!(text, " = {}", expr_text(init));
                }
                text.push(';');
                self.line(&text);
            }
            ClassMember::Method(method) => {
                let mut head = String::from(Self::access_prefix(method.access));
                for modifier in &method.modifiers {
                    let _ = write!(head, "{modifier} ");
                }
                head.push_str(&self.signature_text(
                    &method.name,
                    &[],
                    &method.params,
                    method.return_type.as_ref(),
                ));
                match &method.body {
                    Some(body) => {
                        self.open(&format!("{head} {{"));
                        for stmt in &body.statements {
                            self.stmt(stmt);
                        }
                        self.close("}");
                    }
                    None => self.line(&format!("{head};")),
                }
            }
            ClassMember::Constructor(ctor) => {
                let mut head = String::from(Self::access_prefix(ctor.access));
                head.push_str(&self.signature_text("constructor", &[], &ctor.params, None));
                match &ctor.body {
                    Some(body) => {
                        self.open(&format!("{head} {{"));
                        for stmt in &body.statements {
                            self.stmt(stmt);
                        }
                        self.close("}");
                    }
                    None => self.line(&format!("{head};")),
                }
            }
            ClassMember::Property(prop) => {
                let mut head = String::from(Self::access_prefix(prop.access));
                match prop.kind {
                    PropertyKind::Get => {
                        let _ = write!(head, "get {}: {}", prop.name, type_text(&prop.ty));
                    }
                    PropertyKind::Set => {
                        let param = prop
                            .param
                            .as_ref()
                            .map(param_text)
                            .unwrap_or_else(|| format!("value: {}", type_text(&prop.ty)));
                        let _ = write!(head, "set {}({param})", prop.name);
                    }
                }
                match &prop.body {
                    Some(body) => {
                        self.open(&format!("{head} {{"));
                        for stmt in &body.statements {
                            self.stmt(stmt);
                        }
                        self.close("}");
                    }
                    None => self.line(&format!("{head};")),
                }
            }
        }
    }

    fn interface_decl(&mut self, interface: &InterfaceDecl) {
        let mut head = String::new();
        if interface.is_zerocast {
            head.push_str("#zerocast ");
        }
        let _ = write!(head, "interface {}", interface.name);
        if !interface.generic_params.is_empty() {
            head.push('<');
            for (i, gp) in interface.generic_params.iter().enumerate() {
                if i > 0 {
                    head.push_str(", ");
                }
                head.push_str(&gp.name);
            }
            head.push('>');
        }
        if !interface.extends.is_empty() {
            head.push_str(" extends ");
            for (i, ty) in interface.extends.iter().enumerate() {
                if i > 0 {
                    head.push_str(", ");
                }
                head.push_str(&type_text(ty));
            }
        }
        self.open(&format!("{head} {{"));
        for member in &interface.members {
            match member {
                InterfaceMember::Method(sig) => {
                    let text = self.signature_text(
                        &sig.name,
                        &[],
                        &sig.params,
                        Some(&sig.return_type),
                    );
                    self.line(&format!("{text};"));
                }
                InterfaceMember::Property(sig) => {
                    let accessor = match (sig.has_getter, sig.has_setter) {
                        (true, false) => "get ",
                        (false, true) => "set ",
                        _ => "",
                    };
                    self.line(&format!("{accessor}{}: {};", sig.name, type_text(&sig.ty)));
                }
            }
        }
        self.close("}");
    }

    fn enum_decl(&mut self, en: &EnumDecl) {
        let mut head = format!("enum {}", en.name);
        if let Some(ty) = &en.underlying_type {
            let _ = write!(head, ": {}", type_text(ty));
        }
        self.open(&format!("{head} {{"));
        for member in &en.members {
            let mut text = member.name.clone();
            if let Some(value) = &member.value {
                let _ = write!(text, " = {}", expr_text(value));
            }
            text.push(',');
            self.line(&text);
        }
        self.close("}");
    }

    // -----------------------------------------------------------------
    // Statements
    // -----------------------------------------------------------------

    fn stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Block(block) => {
                self.open("{");
                for inner in &block.statements {
                    self.stmt(inner);
                }
                self.close("}");
            }
            Stmt::Expr(s) => {
                let text = expr_text(&s.expr);
                self.line(&format!("{text};"));
            }
            Stmt::Decl(s) => self.decl(&s.decl),
            Stmt::If(s) => {
                self.open(&format!("if ({}) {{", expr_text(&s.condition)));
                self.branch_body(&s.then_branch);
                match &s.else_branch {
                    Some(else_branch) => {
                        self.indent -= 1;
                        self.line("} else {");
                        self.indent += 1;
                        self.branch_body(else_branch);
                        self.close("}");
                    }
                    None => self.close("}"),
                }
            }
            Stmt::While(s) => {
                self.open(&format!("while ({}) {{", expr_text(&s.condition)));
                self.branch_body(&s.body);
                self.close("}");
            }
            Stmt::DoWhile(s) => {
                self.open("do {");
                self.branch_body(&s.body);
                self.indent -= 1;
                self.line(&format!("}} while ({});", expr_text(&s.condition)));
            }
            Stmt::For(s) => {
                let init = match &s.initializer {
                    Some(init) => self.inline_stmt_text(init),
                    None => ";".to_string(),
                };
                let cond = s.condition.as_ref().map(expr_text).unwrap_or_default();
                let step = s.increment.as_ref().map(expr_text).unwrap_or_default();
                self.open(&format!("for ({init} {cond}; {step}) {{"));
                self.branch_body(&s.body);
                self.close("}");
            }
            Stmt::ForOf(s) => {
                let keyword = if s.binding_is_const { "const" } else { "let" };
                let mut binding = format!("{keyword} {}", s.binding);
                if let Some(ty) = &s.binding_type {
                    let _ = write!(binding, ": {}", type_text(ty));
                }
                self.open(&format!(
                    "for ({binding} of {}) {{",
                    expr_text(&s.iterable)
                ));
                self.branch_body(&s.body);
                self.close("}");
            }
            Stmt::Break(_) => self.line("break;"),
            Stmt::Continue(_) => self.line("continue;"),
            Stmt::Return(s) => match &s.value {
                Some(value) => self.line(&format!("return {};", expr_text(value))),
                None => self.line("return;"),
            },
            Stmt::Try(s) => {
                self.open("try {");
                for inner in &s.try_block.statements {
                    self.stmt(inner);
                }
                for clause in &s.catch_clauses {
                    let mut head = format!("}} catch ({}", clause.param);
                    if let Some(ty) = &clause.param_type {
                        let _ = write!(head, ": {}", type_text(ty));
                    }
                    head.push_str(") {");
                    self.indent -= 1;
                    self.line(&head);
                    self.indent += 1;
                    for inner in &clause.body.statements {
                        self.stmt(inner);
                    }
                }
                if let Some(finally_block) = &s.finally_block {
                    self.indent -= 1;
                    self.line("} finally {");
                    self.indent += 1;
                    for inner in &finally_block.statements {
                        self.stmt(inner);
                    }
                }
                self.close("}");
            }
            Stmt::Throw(s) => self.line(&format!("throw {};", expr_text(&s.value))),
            Stmt::Switch(s) => {
                self.open(&format!("switch ({}) {{", expr_text(&s.scrutinee)));
                for case in &s.cases {
                    match &case.value {
                        Some(value) => self.open(&format!("case {}:", expr_text(value))),
                        None => self.open("default:"),
                    }
                    for inner in &case.body {
                        self.stmt(inner);
                    }
                    self.indent -= 1;
                }
                self.close("}");
            }
            Stmt::Labeled(s) => {
                let label = format!("{}:", s.label);
                self.line(&label);
                self.stmt(&s.statement);
            }
            Stmt::Assembly(s) => {
                self.line(&format!("#asm(\"{}\");", escape_string(&s.code)));
            }
        }
    }

    /// Bodies of control statements always print as blocks; a non-block
    /// body is printed as its single statement.
    fn branch_body(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Block(block) => {
                for inner in &block.statements {
                    self.stmt(inner);
                }
            }
            other => self.stmt(other),
        }
    }

    /// One-line rendering for `for` initializers.
    fn inline_stmt_text(&mut self, stmt: &Stmt) -> String {
        match stmt {
            Stmt::Decl(s) => match &s.decl {
                Decl::Var(var) => self.var_decl_text(var),
                _ => ";".to_string(),
            },
            Stmt::Expr(s) => format!("{};", expr_text(&s.expr)),
            _ => ";".to_string(),
        }
    }

    fn expr(&mut self, expr: &Expr) {
        let text = expr_text(expr);
        self.out.push_str(&text);
    }
}

// ---------------------------------------------------------------------
// Expression and type rendering
// ---------------------------------------------------------------------

fn param_text(param: &Param) -> String {
    let mut text = String::new();
    if param.is_ref {
        text.push_str("ref ");
    } else if param.is_const {
        text.push_str("const ");
    }
    let _ = write!(text, "{}: {}", param.name, type_text(&param.ty));
    if let Some(default) = &param.default_value {
        let _ = write!(text, " = {}", expr_text(default));
    }
    text
}

fn escape_string(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out
}

pub(crate) fn expr_text(expr: &Expr) -> String {
    match expr {
        Expr::Literal(lit) => match lit.kind {
            LiteralKind::String => format!("\"{}\"", escape_string(&lit.text)),
            _ => lit.text.clone(),
        },
        Expr::Identifier(ident) => ident.name.clone(),
        Expr::Binary(e) => format!(
            "({} {} {})",
            expr_text(&e.left),
            e.op,
            expr_text(&e.right)
        ),
        Expr::Unary(e) => {
            if e.prefix {
                format!("({}{})", e.op, expr_text(&e.operand))
            } else {
                format!("({}{})", expr_text(&e.operand), e.op)
            }
        }
        Expr::Assignment(e) => format!(
            "{} {} {}",
            expr_text(&e.target),
            e.op,
            expr_text(&e.value)
        ),
        Expr::Conditional(e) => format!(
            "({} ? {} : {})",
            expr_text(&e.condition),
            expr_text(&e.then_expr),
            expr_text(&e.else_expr)
        ),
        Expr::Call(e) => {
            let mut text = expr_text(&e.callee);
            if !e.type_arguments.is_empty() {
                text.push('<');
                text.push_str(&e.type_arguments.join(", "));
                text.push('>');
            }
            text.push('(');
            text.push_str(
                &e.arguments
                    .iter()
                    .map(expr_text)
                    .collect::<Vec<_>>()
                    .join(", "),
            );
            text.push(')');
            text
        }
        Expr::Member(e) => {
            let sep = if e.through_pointer { "@" } else { "." };
            format!("{}{sep}{}", expr_text(&e.object), e.member)
        }
        Expr::Index(e) => format!("{}[{}]", expr_text(&e.object), expr_text(&e.index)),
        Expr::ArrayLiteral(e) => format!(
            "[{}]",
            e.elements
                .iter()
                .map(expr_text)
                .collect::<Vec<_>>()
                .join(", ")
        ),
        Expr::This(_) => "this".to_string(),
        Expr::New(e) => format!(
            "new {}({})",
            e.class_name,
            e.arguments
                .iter()
                .map(expr_text)
                .collect::<Vec<_>>()
                .join(", ")
        ),
        Expr::Cast(e) => format!(
            "cast<{}>({})",
            type_text(&e.target_type),
            expr_text(&e.expr)
        ),
        Expr::CompileTime(e) => {
            let keyword = match e.op {
                CompileTimeOp::Sizeof => "#sizeof",
                CompileTimeOp::Alignof => "#alignof",
                CompileTimeOp::Typeof => "#typeof",
                CompileTimeOp::ConstExpr => "#const",
            };
            format!("{keyword}({})", expr_text(&e.operand))
        }
        Expr::PointerOf(e) => {
            if e.is_unsafe {
                format!("(@#unsafe {})", expr_text(&e.operand))
            } else {
                format!("(@{})", expr_text(&e.operand))
            }
        }
        Expr::Function(e) => {
            let params = e
                .params
                .iter()
                .map(param_text)
                .collect::<Vec<_>>()
                .join(", ");
            let ret = e
                .return_type
                .as_ref()
                .map(|t| format!(": {}", type_text(t)))
                .unwrap_or_default();
            // Bodies inside expressions print flattened.
            let mut printer = Printer::new();
            for stmt in &e.body.statements {
                printer.stmt(stmt);
            }
            let body = printer.out.replace('\n', " ");
            format!("function ({params}){ret} {{ {body}}}")
        }
    }
}

pub(crate) fn type_text(ty: &TypeExpr) -> String {
    match ty {
        TypeExpr::Primitive(p) => p.keyword.to_string(),
        TypeExpr::Named(n) => n.name.clone(),
        TypeExpr::Qualified(q) => q.segments.join("."),
        TypeExpr::Array(a) => match &a.size {
            Some(size) => format!("{}[{}]", type_text(&a.element), expr_text(size)),
            None => format!("{}[]", type_text(&a.element)),
        },
        TypeExpr::Pointer(p) => match &p.qualifier {
            PointerQualifier::Default => format!("{}@", type_text(&p.base)),
            PointerQualifier::Unsafe => format!("{}@unsafe", type_text(&p.base)),
            PointerQualifier::Aligned(n) => format!("{}@aligned({n})", type_text(&p.base)),
        },
        TypeExpr::Reference(r) => format!("{}&", type_text(&r.base)),
        TypeExpr::Function(f) => format!(
            "function({}): {}",
            f.params.iter().map(type_text).collect::<Vec<_>>().join(", "),
            type_text(&f.return_type)
        ),
        TypeExpr::Template(t) => format!(
            "{}<{}>",
            type_text(&t.base),
            t.arguments
                .iter()
                .map(type_text)
                .collect::<Vec<_>>()
                .join(", ")
        ),
        TypeExpr::Smart(s) => {
            let keyword = match s.kind {
                SmartPtrKind::Shared => "#shared",
                SmartPtrKind::Unique => "#unique",
                SmartPtrKind::Weak => "#weak",
            };
            format!("{keyword}<{}>", type_text(&s.pointee))
        }
        TypeExpr::Union(u) => format!("{} | {}", type_text(&u.left), type_text(&u.right)),
        TypeExpr::BuiltinConstraint(b) => b.name.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diag::Reporter;
    use crate::lexer;
    use crate::parser;

    fn roundtrip(source: &str) -> (String, String) {
        let mut reporter = Reporter::new();
        let tokens = lexer::lex(source, "p.tsl", &mut reporter);
        let program = parser::parse(tokens, &mut reporter);
        assert!(!reporter.has_errors(), "{:#?}", reporter.diagnostics());
        let printed = print_program(&program);

        let tokens = lexer::lex(&printed, "p2.tsl", &mut reporter);
        let program2 = parser::parse(tokens, &mut reporter);
        assert!(
            !reporter.has_errors(),
            "reparse of:\n{printed}\nfailed: {:#?}",
            reporter.diagnostics()
        );
        let printed2 = print_program(&program2);
        (printed, printed2)
    }

    #[track_caller]
    fn assert_stable(source: &str) {
        let (first, second) = roundtrip(source);
        assert_eq!(first, second, "print -> reparse -> print must be stable");
    }

    #[test]
    fn declarations_round_trip() {
        assert_stable(
            "#static let counter: int = 0;
             const name: string = \"tessel\";
             typedef Ints = int[];
             enum Color: int { Red = 1, Green, Blue }",
        );
    }

    #[test]
    fn functions_round_trip() {
        assert_stable(
            "function max<T extends Comparable>(a: T, b: T): T { if (a < b) { return b; } return a; }
             function log(msg: string): void;",
        );
    }

    #[test]
    fn classes_and_interfaces_round_trip() {
        assert_stable(
            "interface Shape { area(): float; get id: int; }
             class Rect extends Base implements Shape {
                private _w: float = 1.0;
                constructor(w: float) { this._w = w; }
                area(): float { return this._w; }
                get width: float { return this._w; }
                set width(value: float) { this._w = value; }
             }",
        );
    }

    #[test]
    fn statements_round_trip() {
        assert_stable(
            "function demo(n: int): int {
                let total = 0;
                for (let i = 0; i < n; i++) { total += i; }
                for (let e of [1, 2, 3]) { total += e; }
                while (total > 100) { total = total - 1; }
                do { total++; } while (false);
                switch (total) { case 0: return 0; default: break; }
                try { throw total; } catch (e: int) { return e; } finally { total = 0; }
                outer: if (total == 5) { return 5; } else { return total; }
             }",
        );
    }

    #[test]
    fn expressions_round_trip() {
        assert_stable(
            "function demo(): void {
                let a = (1 + 2) * 3 - 4 / 5 % 6;
                let b = a < 3 && a > 1 || !(a == 2);
                let c = a & 1 | a ^ 2;
                let d = a << 1 >> 2;
                let e = ~a + -a;
                let p = @a;
                let v = *p;
                let t = a > 0 ? \"yes\" : \"no\";
                let xs = [1, 2, 3];
                let x = xs[0];
                let w = new Widget(1, 2);
                let f = cast<float>(a);
                let s = #sizeof(a);
            }",
        );
    }

    #[test]
    fn namespaces_round_trip() {
        assert_stable(
            "namespace math {
                const pi: float = 3.14;
                function twice(x: int): int { return x * 2; }
             }
             #asm(\"printf(\\\"ok\\\")\");",
        );
    }

    #[test]
    fn types_round_trip() {
        assert_stable(
            "let a: int@;
             let b: float@unsafe;
             let c: int@aligned(16);
             let d: string[];
             let e: int[4];
             let f: int&;
             let g: function(int, float): bool;
             let h: #shared<Widget>;
             let i: Box<int, string>;
             let j: int | string;
             let k: geometry.Point;",
        );
    }
}
