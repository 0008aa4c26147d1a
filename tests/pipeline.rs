//! End-to-end pipeline scenarios over the emitted IR text.

use pretty_assertions::assert_eq;

use tesselc::ast::{Expr, Item, Program, Stmt};
use tesselc::options::Options;
use tesselc::token::TokenKind;
use tesselc::{check, compile, lexer, lower, parse, Reporter};

fn parse_program(source: &str, reporter: &mut Reporter) -> Program {
    let tokens = lexer::lex(source, "test.tsl", reporter);
    parse(tokens, reporter)
}

fn compile_ok(source: &str) -> String {
    let mut reporter = Reporter::new();
    let module = compile(source, "test.tsl", &Options::default(), &mut reporter)
        .unwrap_or_else(|_| panic!("compile failed: {:#?}", reporter.diagnostics()));
    module.to_string()
}

#[test]
fn s1_integer_add() {
    let source = "function f(a:int,b:int):int { return a+b; }";

    let mut reporter = Reporter::new();
    let program = parse_program(source, &mut reporter);
    assert!(check(&program, &mut reporter), "{:#?}", reporter.diagnostics());

    let text = compile_ok(source);
    assert!(text.contains("define i32 @f(i32 %a, i32 %b)"));
    assert!(text.contains("load i32"));
    assert!(text.contains("add i32"));
    assert!(text.contains("ret i32 %t"));
}

#[test]
fn s2_type_error() {
    let source = r#"let x:int = "hi";"#;

    let mut reporter = Reporter::new();
    let program = parse_program(source, &mut reporter);
    assert!(!check(&program, &mut reporter));

    let diag = reporter
        .diagnostics()
        .iter()
        .find(|d| d.code.is_some())
        .expect("a coded diagnostic");
    let code = diag.code.unwrap();
    assert_eq!(code.prefix, "TC");
    assert!((2000..3000).contains(&code.number), "type-category code, got {code}");
    assert!(diag.message.contains("cannot assign string to int"));

    // The convenience pipeline refuses to lower the bad program.
    let mut reporter = Reporter::new();
    assert!(compile(source, "test.tsl", &Options::default(), &mut reporter).is_err());
}

#[test]
fn s3_break_outside_loop() {
    let source = "break;";

    let mut reporter = Reporter::new();
    let program = parse_program(source, &mut reporter);
    assert!(!check(&program, &mut reporter));

    let code = reporter
        .diagnostics()
        .iter()
        .find_map(|d| d.code)
        .expect("a coded diagnostic");
    assert_eq!(code.prefix, "TC");
    assert!((3000..4000).contains(&code.number), "expression-category code, got {code}");

    // Lowering, if invoked anyway, replaces the statement with a no-op.
    let module = lower(&program, &Options::default(), &mut reporter);
    let text = module.to_string();
    assert!(text.contains("define i32 @main()"));
    assert!(text.contains("ret i32 0"));
}

#[test]
fn s4_for_of_over_array_binds_int() {
    let source = "for (let e of [1,2,3]) { }";

    let mut reporter = Reporter::new();
    let program = parse_program(source, &mut reporter);
    assert!(check(&program, &mut reporter), "{:#?}", reporter.diagnostics());

    // The same loop with an int-annotated use of the binding also checks.
    let source = "for (let e of [1,2,3]) { let x: int = e; }";
    let mut reporter = Reporter::new();
    let program = parse_program(source, &mut reporter);
    assert!(check(&program, &mut reporter), "{:#?}", reporter.diagnostics());
}

#[test]
fn s5_inline_printf() {
    let source = r#"#asm("printf(\"hi\\n\")");"#;
    let text = compile_ok(source);

    // The synthesized main calls the declared printf with "hi\n".
    assert!(text.contains("declare i32 @printf(i8*, ...)"));
    assert!(text.contains("define i32 @main()"));
    assert!(text.contains("@.str.0 = private constant [4 x i8] c\"hi\\0A\\00\""));
    assert!(text.contains("call i32 @printf(i8* @.str.0)"));
    assert!(text.contains("ret i32 0"));
}

#[test]
fn s6_generic_call_disambiguation() {
    // Two comparisons.
    let mut reporter = Reporter::new();
    let program = parse_program("a < b > (c);", &mut reporter);
    assert!(!reporter.has_errors(), "{:#?}", reporter.diagnostics());
    let Item::Stmt(Stmt::Expr(stmt)) = &program.items[0] else {
        panic!("expected expression statement");
    };
    let Expr::Binary(outer) = &stmt.expr else {
        panic!("expected a binary comparison tree, got {:?}", stmt.expr);
    };
    assert_eq!(outer.op, TokenKind::Greater);
    let Expr::Binary(inner) = &*outer.left else {
        panic!("expected a nested comparison");
    };
    assert_eq!(inner.op, TokenKind::Less);

    // One generic call.
    let mut reporter = Reporter::new();
    let program = parse_program("f<T>(c);", &mut reporter);
    assert!(!reporter.has_errors(), "{:#?}", reporter.diagnostics());
    let Item::Stmt(Stmt::Expr(stmt)) = &program.items[0] else {
        panic!("expected expression statement");
    };
    let Expr::Call(call) = &stmt.expr else {
        panic!("expected a call, got {:?}", stmt.expr);
    };
    assert_eq!(call.type_arguments, vec!["T".to_string()]);
    assert_eq!(call.arguments.len(), 1);
}

#[test]
fn exactly_one_main_per_module() {
    // Synthesized.
    let text = compile_ok("1 + 1;");
    assert_eq!(text.matches("define i32 @main()").count(), 1);

    // User-provided.
    let text = compile_ok("function main(): int { return 3; }");
    assert_eq!(text.matches("define i32 @main").count(), 1);
}

#[test]
fn functions_always_end_terminated() {
    let text = compile_ok(
        "function a(): void { }
         function b(): int { }
         function c(x: int): int { if (x > 0) { return 1; } }",
    );
    assert!(text.contains("ret void"));
    // Both int functions get a trailing default return on the fall-through
    // path.
    assert!(text.contains("ret i32 0"));
}

#[test]
fn diagnostics_are_ordered_by_phase() {
    let mut reporter = Reporter::new();
    let source = "let bad: = 1;\nlet x: int = \"hi\";";
    let program = parse_program(source, &mut reporter);
    let parse_errors = reporter.error_count();
    assert!(parse_errors > 0);
    check(&program, &mut reporter);
    assert!(reporter.error_count() > parse_errors);

    let prefixes: Vec<&str> = reporter
        .diagnostics()
        .iter()
        .filter_map(|d| d.code.map(|c| c.prefix))
        .collect();
    let last_ps = prefixes.iter().rposition(|p| *p == "PS").unwrap();
    let first_tc = prefixes.iter().position(|p| *p == "TC").unwrap();
    assert!(last_ps < first_tc);
}

#[test]
fn checked_program_survives_a_second_independent_walk() {
    // Checking twice over fresh state reports the same (empty) outcome:
    // the checker never mutates the AST.
    let mut reporter = Reporter::new();
    let program = parse_program(
        "function fib(n: int): int {
            if (n < 2) { return n; }
            return fib(n - 1) + fib(n - 2);
         }",
        &mut reporter,
    );
    assert!(check(&program, &mut reporter));
    assert!(check(&program, &mut reporter));
    assert_eq!(reporter.error_count(), 0);
}

#[test]
fn recovery_keeps_later_items() {
    let mut reporter = Reporter::new();
    let program = parse_program(
        "let = broken;
         function ok(): int { return 1; }",
        &mut reporter,
    );
    assert!(reporter.has_errors());
    assert!(program.items.iter().any(|item| matches!(
        item,
        Item::Decl(tesselc::ast::Decl::Function(f)) if f.name == "ok"
    )));
}

#[test]
fn print_reparse_print_is_stable() {
    let source = "function gcd(a: int, b: int): int {
        while (b != 0) { let t = b; b = a % b; a = t; }
        return a;
    }
    let seed: int = gcd(48, 18);";

    let mut reporter = Reporter::new();
    let program = parse_program(source, &mut reporter);
    assert!(!reporter.has_errors());
    let printed = tesselc::printer::print_program(&program);

    let reparsed = parse_program(&printed, &mut reporter);
    assert!(!reporter.has_errors(), "{:#?}", reporter.diagnostics());
    assert_eq!(printed, tesselc::printer::print_program(&reparsed));
}

#[test]
fn a_small_realistic_program_compiles_end_to_end() {
    let text = compile_ok(
        "namespace math {
            const scale: int = 3;
            function twice(x: int): int { return x * 2; }
         }

         enum Mode { Off, On }

         function clamp(x: int, lo: int, hi: int): int {
            if (x < lo) { return lo; }
            if (x > hi) { return hi; }
            return x;
         }

         function main(): int {
            let total = 0;
            for (let i = 0; i < 10; i++) {
                total += clamp(math.twice(i), 0, 12);
            }
            switch (total) {
                case 0: return Mode.Off;
                default: return Mode.On;
            }
         }",
    );
    assert!(text.contains("define i32 @math.twice(i32 %x)"));
    assert!(text.contains("define i32 @clamp(i32 %x, i32 %lo, i32 %hi)"));
    assert!(text.contains("define i32 @main()"));
    assert!(text.contains("@math.scale = constant i32 3"));
    assert!(text.contains("switch.end"));
}
