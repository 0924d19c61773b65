use std::cmp::Ordering;
use std::collections::HashMap;
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::callable::{LoxClass, NativeFn, NativeFunction};
use crate::interpreter::{Interpreter, RuntimeError};
use crate::scanner::Token;
use crate::value::Value;

/*
Arity checking is done in the interpreter prior to calling a builtin function.
Argument positions in error messages count from 1.
*/

pub fn define_all(interpreter: &mut Interpreter) {
    interpreter.define_native("clock", 0, false, clock);
    interpreter.define_native("lineSeparator", 0, true, line_separator);
    interpreter.define_native("exit", 1, false, exit);
    let name = Token::special("String");
    interpreter.define_global(&name, Value::LoxClass(Rc::new(string_class(&name))));
}

/// Seconds since the epoch.
pub fn clock(_: &mut Interpreter, call_site: &Token, _args: &[Value]) -> Result<Value, RuntimeError> {
    let since_the_epoch = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|err| RuntimeError::internal(call_site, err.to_string()))?;

    Ok(Value::Number(since_the_epoch.as_secs_f64()))
}

pub fn line_separator(_: &mut Interpreter, _: &Token, _args: &[Value]) -> Result<Value, RuntimeError> {
    Ok(Value::String("\n".to_string()))
}

pub fn exit(_: &mut Interpreter, call_site: &Token, args: &[Value]) -> Result<Value, RuntimeError> {
    let code = number_arg(args, 1, call_site)?;
    Err(RuntimeError::exit(call_site, code as i32))
}

const STRING_METHODS: &[(&str, usize, NativeFn)] = &[
    ("charAt", 2, char_at),
    ("compareTo", 2, compare_to),
    ("compareToIgnoreCase", 2, compare_to_ignore_case),
    ("concat", 2, concat),
    ("contains", 2, contains),
    ("endsWith", 2, ends_with),
    ("equalsIgnoreCase", 2, equals_ignore_case),
    ("hashCode", 1, hash_code),
    ("indexFrom", 3, index_from),
    ("indexOf", 2, index_of),
    ("isBlank", 1, is_blank),
    ("isEmpty", 1, is_empty),
    ("lastIndexFrom", 3, last_index_from),
    ("lastIndexOf", 2, last_index_of),
    ("left", 2, left),
    ("length", 1, length),
    ("repeat", 2, repeat),
    ("replace", 3, replace),
    ("replaceFirst", 3, replace_first),
    ("right", 2, right),
    ("startsFrom", 3, starts_from),
    ("startsWith", 2, starts_with),
    ("strip", 1, trim),
    ("stripLeading", 1, strip_leading),
    ("stripTrailing", 1, strip_trailing),
    ("substring", 3, substring),
    ("toLower", 1, to_lower),
    ("toUpper", 1, to_upper),
    ("trim", 1, trim),
];

/// The native `String` class. Its helpers are class methods taking the
/// string as first argument: `String.length(s)`. Indices count characters.
/// `name` must be the token the class is registered under.
pub fn string_class(name: &Token) -> LoxClass {
    let class_methods: HashMap<String, Value> = STRING_METHODS
        .iter()
        .map(|(name, arity, callable)| {
            let native = NativeFunction {
                name: name.to_string(),
                arity: *arity,
                is_property: false,
                callable: *callable,
            };
            (name.to_string(), Value::NativeFunction(Rc::new(native)))
        })
        .collect();

    LoxClass {
        name: "String".to_string(),
        decl_id: name.id,
        superclasses: Vec::new(),
        methods: HashMap::new(),
        class_methods,
    }
}

fn string_arg<'a>(args: &'a [Value], pos: usize, call_site: &Token) -> Result<&'a str, RuntimeError> {
    match args.get(pos - 1) {
        Some(Value::String(s)) => Ok(s),
        _ => Err(RuntimeError::new(
            call_site,
            format!("Argument #{}: string expected.", pos),
        )),
    }
}

fn number_arg(args: &[Value], pos: usize, call_site: &Token) -> Result<f64, RuntimeError> {
    match args.get(pos - 1) {
        Some(Value::Number(n)) => Ok(*n),
        _ => Err(RuntimeError::new(
            call_site,
            format!("Argument #{}: number expected.", pos),
        )),
    }
}

/// A character position in `0..=limit`.
fn index_arg(args: &[Value], pos: usize, call_site: &Token, limit: usize) -> Result<usize, RuntimeError> {
    let n = number_arg(args, pos, call_site)?;
    if n < 0.0 || n.trunc() as usize > limit {
        return Err(RuntimeError::new(
            call_site,
            format!("Argument #{}: index {} out of range.", pos, n),
        ));
    }
    Ok(n.trunc() as usize)
}

fn char_count(s: &str) -> usize {
    s.chars().count()
}

// byte offset of a match -> character index
fn char_index(s: &str, byte_offset: Option<usize>) -> f64 {
    match byte_offset {
        Some(offset) => char_count(&s[..offset]) as f64,
        None => -1.0,
    }
}

// character index -> byte offset, clamped to the end of `s`
fn byte_offset(s: &str, index: usize) -> usize {
    s.char_indices().nth(index).map_or(s.len(), |(offset, _)| offset)
}

fn ordering(ord: Ordering) -> Value {
    match ord {
        Ordering::Less => Value::Number(-1.0),
        Ordering::Equal => Value::Number(0.0),
        Ordering::Greater => Value::Number(1.0),
    }
}

fn length(_: &mut Interpreter, call_site: &Token, args: &[Value]) -> Result<Value, RuntimeError> {
    let s = string_arg(args, 1, call_site)?;
    Ok(Value::Number(char_count(s) as f64))
}

fn is_empty(_: &mut Interpreter, call_site: &Token, args: &[Value]) -> Result<Value, RuntimeError> {
    Ok(Value::Bool(string_arg(args, 1, call_site)?.is_empty()))
}

fn is_blank(_: &mut Interpreter, call_site: &Token, args: &[Value]) -> Result<Value, RuntimeError> {
    Ok(Value::Bool(string_arg(args, 1, call_site)?.trim().is_empty()))
}

fn char_at(_: &mut Interpreter, call_site: &Token, args: &[Value]) -> Result<Value, RuntimeError> {
    let s = string_arg(args, 1, call_site)?;
    let len = char_count(s);
    let index = if len == 0 {
        None
    } else {
        Some(index_arg(args, 2, call_site, len - 1)?)
    };

    match index.and_then(|index| s.chars().nth(index)) {
        Some(c) => Ok(Value::String(c.to_string())),
        None => Err(RuntimeError::new(
            call_site,
            "Argument #2: index out of range.",
        )),
    }
}

fn compare_to(_: &mut Interpreter, call_site: &Token, args: &[Value]) -> Result<Value, RuntimeError> {
    let s1 = string_arg(args, 1, call_site)?;
    let s2 = string_arg(args, 2, call_site)?;
    Ok(ordering(s1.cmp(s2)))
}

fn compare_to_ignore_case(_: &mut Interpreter, call_site: &Token, args: &[Value]) -> Result<Value, RuntimeError> {
    let s1 = string_arg(args, 1, call_site)?.to_lowercase();
    let s2 = string_arg(args, 2, call_site)?.to_lowercase();
    Ok(ordering(s1.cmp(&s2)))
}

fn concat(_: &mut Interpreter, call_site: &Token, args: &[Value]) -> Result<Value, RuntimeError> {
    let s1 = string_arg(args, 1, call_site)?;
    let s2 = string_arg(args, 2, call_site)?;
    Ok(Value::String(format!("{}{}", s1, s2)))
}

fn contains(_: &mut Interpreter, call_site: &Token, args: &[Value]) -> Result<Value, RuntimeError> {
    let s = string_arg(args, 1, call_site)?;
    Ok(Value::Bool(s.contains(string_arg(args, 2, call_site)?)))
}

fn starts_with(_: &mut Interpreter, call_site: &Token, args: &[Value]) -> Result<Value, RuntimeError> {
    let s = string_arg(args, 1, call_site)?;
    Ok(Value::Bool(s.starts_with(string_arg(args, 2, call_site)?)))
}

fn ends_with(_: &mut Interpreter, call_site: &Token, args: &[Value]) -> Result<Value, RuntimeError> {
    let s = string_arg(args, 1, call_site)?;
    Ok(Value::Bool(s.ends_with(string_arg(args, 2, call_site)?)))
}

fn equals_ignore_case(_: &mut Interpreter, call_site: &Token, args: &[Value]) -> Result<Value, RuntimeError> {
    let s1 = string_arg(args, 1, call_site)?;
    let s2 = string_arg(args, 2, call_site)?;
    Ok(Value::Bool(s1.to_lowercase() == s2.to_lowercase()))
}

fn index_of(_: &mut Interpreter, call_site: &Token, args: &[Value]) -> Result<Value, RuntimeError> {
    let s = string_arg(args, 1, call_site)?;
    let pattern = string_arg(args, 2, call_site)?;
    Ok(Value::Number(char_index(s, s.find(pattern))))
}

fn last_index_of(_: &mut Interpreter, call_site: &Token, args: &[Value]) -> Result<Value, RuntimeError> {
    let s = string_arg(args, 1, call_site)?;
    let pattern = string_arg(args, 2, call_site)?;
    Ok(Value::Number(char_index(s, s.rfind(pattern))))
}

fn index_from(_: &mut Interpreter, call_site: &Token, args: &[Value]) -> Result<Value, RuntimeError> {
    let s = string_arg(args, 1, call_site)?;
    let pattern = string_arg(args, 2, call_site)?;
    let from = number_arg(args, 3, call_site)?.max(0.0) as usize;
    let start = byte_offset(s, from);
    let found = s[start..].find(pattern).map(|offset| start + offset);
    Ok(Value::Number(char_index(s, found)))
}

/// Last match starting at or before the given index.
fn last_index_from(_: &mut Interpreter, call_site: &Token, args: &[Value]) -> Result<Value, RuntimeError> {
    let s = string_arg(args, 1, call_site)?;
    let pattern = string_arg(args, 2, call_site)?;
    let from = number_arg(args, 3, call_site)?;
    if from < 0.0 {
        return Ok(Value::Number(-1.0));
    }
    let end = byte_offset(s, from as usize + char_count(pattern));
    Ok(Value::Number(char_index(s, s[..end].rfind(pattern))))
}

fn starts_from(_: &mut Interpreter, call_site: &Token, args: &[Value]) -> Result<Value, RuntimeError> {
    let s = string_arg(args, 1, call_site)?;
    let prefix = string_arg(args, 2, call_site)?;
    let from = number_arg(args, 3, call_site)?;
    if from < 0.0 || from as usize > char_count(s) {
        return Ok(Value::Bool(false));
    }
    Ok(Value::Bool(s[byte_offset(s, from as usize)..].starts_with(prefix)))
}

fn left(_: &mut Interpreter, call_site: &Token, args: &[Value]) -> Result<Value, RuntimeError> {
    let s = string_arg(args, 1, call_site)?;
    let stop = index_arg(args, 2, call_site, char_count(s))?;
    Ok(Value::String(s.chars().take(stop).collect()))
}

fn right(_: &mut Interpreter, call_site: &Token, args: &[Value]) -> Result<Value, RuntimeError> {
    let s = string_arg(args, 1, call_site)?;
    let start = index_arg(args, 2, call_site, char_count(s))?;
    Ok(Value::String(s.chars().skip(start).collect()))
}

fn substring(_: &mut Interpreter, call_site: &Token, args: &[Value]) -> Result<Value, RuntimeError> {
    let s = string_arg(args, 1, call_site)?;
    let len = char_count(s);
    let start = index_arg(args, 2, call_site, len)?;
    let stop = index_arg(args, 3, call_site, len)?;
    if stop < start {
        return Err(RuntimeError::new(
            call_site,
            format!("Argument #3: index {} out of range.", stop),
        ));
    }
    Ok(Value::String(s.chars().skip(start).take(stop - start).collect()))
}

fn repeat(_: &mut Interpreter, call_site: &Token, args: &[Value]) -> Result<Value, RuntimeError> {
    let s = string_arg(args, 1, call_site)?;
    let count = number_arg(args, 2, call_site)?;
    if count < 0.0 {
        return Err(RuntimeError::new(
            call_site,
            "Argument #2: non-negative number expected.",
        ));
    }
    Ok(Value::String(s.repeat(count as usize)))
}

fn replace(_: &mut Interpreter, call_site: &Token, args: &[Value]) -> Result<Value, RuntimeError> {
    let s = string_arg(args, 1, call_site)?;
    let from = string_arg(args, 2, call_site)?;
    let to = string_arg(args, 3, call_site)?;
    Ok(Value::String(s.replace(from, to)))
}

fn replace_first(_: &mut Interpreter, call_site: &Token, args: &[Value]) -> Result<Value, RuntimeError> {
    let s = string_arg(args, 1, call_site)?;
    let from = string_arg(args, 2, call_site)?;
    let to = string_arg(args, 3, call_site)?;
    Ok(Value::String(s.replacen(from, to, 1)))
}

/// The 32-bit polynomial hash over UTF-16 units that JVM strings use.
fn hash_code(_: &mut Interpreter, call_site: &Token, args: &[Value]) -> Result<Value, RuntimeError> {
    let hash = string_arg(args, 1, call_site)?
        .encode_utf16()
        .fold(0i32, |hash, unit| hash.wrapping_mul(31).wrapping_add(i32::from(unit)));
    Ok(Value::Number(f64::from(hash)))
}

fn to_lower(_: &mut Interpreter, call_site: &Token, args: &[Value]) -> Result<Value, RuntimeError> {
    Ok(Value::String(string_arg(args, 1, call_site)?.to_lowercase()))
}

fn to_upper(_: &mut Interpreter, call_site: &Token, args: &[Value]) -> Result<Value, RuntimeError> {
    Ok(Value::String(string_arg(args, 1, call_site)?.to_uppercase()))
}

fn trim(_: &mut Interpreter, call_site: &Token, args: &[Value]) -> Result<Value, RuntimeError> {
    Ok(Value::String(string_arg(args, 1, call_site)?.trim().to_string()))
}

fn strip_leading(_: &mut Interpreter, call_site: &Token, args: &[Value]) -> Result<Value, RuntimeError> {
    Ok(Value::String(
        string_arg(args, 1, call_site)?.trim_start().to_string(),
    ))
}

fn strip_trailing(_: &mut Interpreter, call_site: &Token, args: &[Value]) -> Result<Value, RuntimeError> {
    Ok(Value::String(
        string_arg(args, 1, call_site)?.trim_end().to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer;
    use crate::diagnostics::Diagnostics;
    use crate::interpreter::ErrorKind;
    use crate::parser;
    use crate::scanner;
    use pretty_assertions::assert_eq;

    fn run(code: &str) -> (Result<(), ErrorKind>, Diagnostics) {
        let mut diagnostics = Diagnostics::default();
        let mut interpreter = Interpreter::default();
        let tokens = scanner::scan_tokens(code, &mut diagnostics);
        let stmts = parser::parse(tokens, &mut diagnostics);
        let resolutions = analyzer::analyze(&stmts, interpreter.environment(), &mut diagnostics);
        assert!(!diagnostics.has_error(), "{}", diagnostics.stderr());
        let res = interpreter.interpret(&stmts, resolutions, &mut diagnostics);
        (res, diagnostics)
    }

    fn check_output(code: &str, expected_output: &str) {
        let (res, diagnostics) = run(code);
        assert_eq!(res, Ok(()), "{}", diagnostics.stderr());
        assert_eq!(diagnostics.stdout(), expected_output);
    }

    fn check_error(code: &str, expected: &str) {
        let (res, diagnostics) = run(code);
        assert_eq!(res, Err(ErrorKind::Runtime));
        assert_eq!(diagnostics.stderr(), expected);
    }

    #[test]
    fn test_clock() {
        check_output("print clock() > 0;", "true\n");
    }

    #[test]
    fn test_line_separator_is_a_property() {
        check_output("print \"a\" + lineSeparator + \"b\";", "a\nb\n");
    }

    #[test]
    fn test_exit() {
        let (res, diagnostics) = run("print 1;\nexit(3);\nprint 2;");
        assert_eq!(res, Err(ErrorKind::Exit(3)));
        assert_eq!(diagnostics.stdout(), "1\n");
        assert_eq!(diagnostics.stderr(), "");

        check_error(
            "exit(\"now\");",
            "[line 1] Error at '(': Argument #1: number expected.\n",
        );
    }

    #[test]
    fn test_natives_are_readonly() {
        let mut diagnostics = Diagnostics::default();
        let interpreter = Interpreter::default();
        let tokens = scanner::scan_tokens("clock = 1;", &mut diagnostics);
        let stmts = parser::parse(tokens, &mut diagnostics);
        analyzer::analyze(&stmts, interpreter.environment(), &mut diagnostics);
        assert_eq!(
            diagnostics.stderr(),
            "[line 1] Error at 'clock': Readonly symbol 'clock' cannot be modified.\n"
        );
    }

    #[test]
    fn test_string_queries() {
        check_output(
            "print String.length(\"héllo\");\n\
             print String.isEmpty(\"\");\n\
             print String.isBlank(\" \t\");\n\
             print String.contains(\"haystack\", \"st\");\n\
             print String.startsWith(\"haystack\", \"hay\");\n\
             print String.endsWith(\"haystack\", \"hay\");",
            "5\ntrue\ntrue\ntrue\ntrue\nfalse\n",
        );
    }

    #[test]
    fn test_string_indices() {
        check_output(
            "print String.charAt(\"héllo\", 1);\n\
             print String.indexOf(\"héllo\", \"l\");\n\
             print String.lastIndexOf(\"héllo\", \"l\");\n\
             print String.indexOf(\"abc\", \"z\");\n\
             print String.substring(\"héllo\", 1, 3);\n\
             print String.left(\"hello\", 2);\n\
             print String.right(\"hello\", 3);",
            "é\n2\n3\n-1\nél\nhe\nlo\n",
        );
    }

    #[test]
    fn test_string_transforms() {
        check_output(
            "print String.toUpper(\"abc\");\n\
             print String.toLower(\"ABC\");\n\
             print \"[\" + String.trim(\"  x  \") + \"]\";\n\
             print \"[\" + String.stripLeading(\"  x  \") + \"]\";\n\
             print String.repeat(\"ab\", 3);\n\
             print String.replace(\"a-b-c\", \"-\", \"+\");\n\
             print String.concat(\"foo\", \"bar\");",
            "ABC\nabc\n[x]\n[x  ]\nababab\na+b+c\nfoobar\n",
        );
    }

    #[test]
    fn test_string_searches_from_index() {
        check_output(
            "print String.indexFrom(\"banana\", \"an\", 2);\n\
             print String.indexFrom(\"banana\", \"an\", 5);\n\
             print String.indexFrom(\"héllo\", \"l\", 3);\n\
             print String.lastIndexFrom(\"banana\", \"an\", 2);\n\
             print String.lastIndexFrom(\"banana\", \"an\", -1);\n\
             print String.startsFrom(\"banana\", \"nan\", 2);\n\
             print String.startsFrom(\"banana\", \"nan\", 9);",
            "3\n-1\n3\n1\n-1\ntrue\nfalse\n",
        );
    }

    #[test]
    fn test_string_strip_replace_first_and_hash() {
        check_output(
            "print \"[\" + String.strip(\" \tx \") + \"]\";\n\
             print String.replaceFirst(\"a-b-c\", \"-\", \"+\");\n\
             print String.hashCode(\"Lox\");\n\
             print String.hashCode(\"\");",
            "[x]\na+b-c\n76597\n0\n",
        );
    }

    #[test]
    fn test_string_class_can_be_inherited() {
        check_output(
            "class Text < String {}\nprint Text.length(\"abc\");",
            "3\n",
        );
        check_error(
            "class S < String { m() { return super(String).length; } }\nprint S().m();",
            "[line 1] Error at 'length': Superclass 'String' has no available method 'length'.\n",
        );
    }

    #[test]
    fn test_string_comparison() {
        check_output(
            "print String.compareTo(\"a\", \"b\");\n\
             print String.compareTo(\"b\", \"b\");\n\
             print String.compareToIgnoreCase(\"B\", \"a\");\n\
             print String.equalsIgnoreCase(\"Lox\", \"LOX\");",
            "-1\n0\n1\ntrue\n",
        );
    }

    #[test]
    fn test_string_argument_errors() {
        check_error(
            "String.length(1);",
            "[line 1] Error at '(': Argument #1: string expected.\n",
        );
        check_error(
            "String.charAt(\"abc\", 3);",
            "[line 1] Error at '(': Argument #2: index 3 out of range.\n",
        );
        check_error(
            "String.substring(\"abc\", 2, 1);",
            "[line 1] Error at '(': Argument #3: index 1 out of range.\n",
        );
        check_error(
            "String.repeat(\"abc\", -1);",
            "[line 1] Error at '(': Argument #2: non-negative number expected.\n",
        );
    }
}
