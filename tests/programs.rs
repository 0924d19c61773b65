use loxi::ast_printer::AstPrinter;
use loxi::diagnostics::Diagnostics;
use loxi::lox::{Lox, LoxError, Mode};
use loxi::parser;
use loxi::scanner;
use pretty_assertions::assert_eq;

fn run(code: &str) -> (Result<(), LoxError>, String, String) {
    let mut lox = Lox::new();
    let res = lox.run_source(code, Mode::Run);
    let diagnostics = lox.diagnostics();
    (res, diagnostics.stdout().to_string(), diagnostics.stderr())
}

fn check_output(code: &str, expected: &str) {
    let (res, stdout, stderr) = run(code);
    assert!(res.is_ok(), "{}", stderr);
    assert_eq!(stdout, expected);
}

fn print_program(code: &str, multi_line: bool) -> String {
    let mut diagnostics = Diagnostics::default();
    let tokens = scanner::scan_tokens(code, &mut diagnostics);
    let stmts = parser::parse(tokens, &mut diagnostics);
    assert!(!diagnostics.has_error(), "{}", diagnostics.stderr());
    let mut printer = if multi_line {
        AstPrinter::multi_line()
    } else {
        AstPrinter::one_line()
    };
    printer.print_program(&stmts)
}

#[test]
fn arithmetic_program() {
    check_output("print 1 + 2 * 3;\nprint 10 / 4;", "7\n2.5\n");
}

#[test]
fn printed_program_reparses_to_the_same_text() {
    let code = "class Shape < Base {\n\
                  class unit() { return Shape(1); }\n\
                  init(size) { self.size = size; }\n\
                  area: self.size * self.size;\n\
                  grow(by) { self.size += by; return super.grow(by); }\n\
                }\n\
                fun apply(f, x) { return f(x); }\n\
                var total = 0;\n\
                for (var i = 0; i < 10; ++i) {\n\
                  if (i % 2 == 0) continue;\n\
                  total = total + (i > 5 ? apply(fun (n) n * 2, i) : i);\n\
                }\n\
                while (total > 0) { total -= 7; if (total < 3) break; }\n\
                print \"done\\n\", total;";

    for multi_line in [true, false] {
        let printed = print_program(code, multi_line);
        assert_eq!(print_program(&printed, multi_line), printed);
    }
}

#[test]
fn variable_is_undefined_after_its_block() {
    let (res, stdout, stderr) = run("{ var inner = 1; print inner; }\nprint inner;");
    assert!(matches!(res, Err(LoxError::Static(1))));
    assert_eq!(stdout, "");
    assert_eq!(
        stderr,
        "[line 2] Error at 'inner': Undefined identifier 'inner'.\n"
    );
}

#[test]
fn closures_make_independent_counters() {
    check_output(
        "fun counter() {\n\
           var n = 0;\n\
           return fun () { n += 1; return n; };\n\
         }\n\
         var a = counter();\n\
         var b = counter();\n\
         a(); a();\n\
         print a();\n\
         print b();",
        "3\n1\n",
    );
}

#[test]
fn multiple_inheritance_with_explicit_super() {
    check_output(
        "class Walker { move() { return \"walk\"; } }\n\
         class Swimmer { move() { return \"swim\"; } }\n\
         class Duck < Walker, Swimmer {\n\
           move() { return super.move() + \"+\" + super(Swimmer).move(); }\n\
         }\n\
         print Duck().move();",
        "walk+swim\n",
    );
}

#[test]
fn dead_code_is_reported_once() {
    let (res, stdout, stderr) = run(
        "fun f() {\n\
           return 1;\n\
           print \"never\";\n\
         }\n\
         print f();",
    );
    assert!(res.is_ok());
    assert_eq!(stdout, "1\n");
    assert_eq!(
        stderr,
        "[line 2] Warning at 'return': Dead code: print \"never\";\n"
    );
}

#[test]
fn division_by_zero_stops_the_program() {
    let (res, stdout, stderr) = run("print \"before\";\nprint 1 / 0;\nprint \"after\";");
    assert!(matches!(res, Err(LoxError::Runtime)));
    assert_eq!(stdout, "before\n");
    assert_eq!(stderr, "[line 2] Error at '/': Division by zero.\n");
}

#[test]
fn continue_still_runs_the_updater() {
    check_output(
        "var seen = \"\";\n\
         for (var i = 0; i < 6; i += 1) {\n\
           if (i % 2 == 1) continue;\n\
           if (i == 4) break;\n\
           seen += i;\n\
         }\n\
         print seen;",
        "02\n",
    );
}

#[test]
fn arity_mismatch() {
    let (res, _, stderr) = run("fun pair(a, b) { return a; }\npair(1, 2, 3);");
    assert!(matches!(res, Err(LoxError::Runtime)));
    assert_eq!(
        stderr,
        "[line 2] Error at '(': Expected 2 arguments but got 3.\n"
    );
}

#[test]
fn extended_syntax() {
    check_output(
        "var x = 5;\n\
         x *= 2;\n\
         print ++x;\n\
         print x > 10 ? \"big\" : \"small\";\n\
         print (x = 1, x + 1);\n\
         var double = fun (n) n * 2;\n\
         print double(21);",
        "11\nbig\n2\n42\n",
    );
}

#[test]
fn properties_class_methods_and_initializers() {
    check_output(
        "class Temp {\n\
           class freezing() { return Temp(0); }\n\
           init(c) { self.c = c; }\n\
           fahrenheit: self.c * 9 / 5 + 32;\n\
         }\n\
         var t = Temp.freezing();\n\
         print t.fahrenheit;\n\
         print t.init(100) == t;\n\
         print t.fahrenheit;",
        "32\ntrue\n212\n",
    );
}

#[test]
fn shadowed_closure_uses_resolved_binding() {
    check_output(
        "var name = \"outer\";\n\
         fun run() {\n\
           fun show() { return name; }\n\
           var first = show();\n\
           var name = \"inner\";\n\
           return first + \" \" + show() + \" \" + name;\n\
         }\n\
         print run();",
        "outer outer inner\n",
    );
}

#[test]
fn strings_and_natives() {
    check_output(
        "var s = \"Hello\";\n\
         print String.toUpper(s) + lineSeparator + String.length(s);",
        "HELLO\n5\n",
    );
}

#[test]
fn session_keeps_definitions() {
    let mut lox = Lox::new();
    lox.run_source("fun greet(who) { return \"hi \" + who; }", Mode::Run)
        .unwrap();
    lox.run_source("greet(\"lox\")", Mode::Run).unwrap();
    assert_eq!(lox.diagnostics().stdout(), "hi lox\n");
}
