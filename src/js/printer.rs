use std::fmt::Write;

use super::ast::*;

/// Configuration for rendering JavaScript source code.
#[derive(Clone, Debug)]
pub struct RenderConfig {
    pub indent: String,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            indent: "  ".into(),
        }
    }
}

/// JavaScript source renderer.
pub struct JsPrinter {
    config: RenderConfig,
    output: String,
    indent_level: usize,
}

impl JsPrinter {
    pub fn new(config: RenderConfig) -> Self {
        Self {
            config,
            output: String::new(),
            indent_level: 0,
        }
    }

    /// Render a list of top-level statements.
    pub fn render_program(mut self, stmts: &[JsStmt]) -> String {
        for stmt in stmts {
            self.render_stmt(stmt);
        }
        self.output
    }

    /// Render a single expression without a trailing newline.
    pub fn render_expr(mut self, expr: &JsExpr) -> String {
        self.expr(expr, 0);
        self.output
    }

    // ---- Statements ----

    fn render_stmt(&mut self, stmt: &JsStmt) {
        match stmt {
            JsStmt::Const { name, init } => {
                self.write_indent();
                self.raw(&format!("const {} = ", name));
                self.expr(init, 2);
                self.raw(";");
                self.raw_newline();
            }
            JsStmt::Expr(expr) => {
                self.write_indent();
                self.expr(expr, 0);
                self.raw(";");
                self.raw_newline();
            }
            JsStmt::Return(value) => {
                self.write_indent();
                match value {
                    Some(value) => {
                        self.raw("return ");
                        self.expr(value, 0);
                        self.raw(";");
                    }
                    None => self.raw("return;"),
                }
                self.raw_newline();
            }
            JsStmt::Throw(value) => {
                self.write_indent();
                self.raw("throw ");
                self.expr(value, 0);
                self.raw(";");
                self.raw_newline();
            }
            JsStmt::If {
                cond,
                then_body,
                else_body,
            } => {
                self.write_indent();
                self.raw("if (");
                self.expr(cond, 0);
                self.raw(") {");
                self.raw_newline();
                self.render_block(then_body);
                self.write_indent();
                if else_body.is_empty() {
                    self.raw("}");
                } else {
                    self.raw("} else {");
                    self.raw_newline();
                    self.render_block(else_body);
                    self.write_indent();
                    self.raw("}");
                }
                self.raw_newline();
            }
            JsStmt::Switch {
                discriminant,
                cases,
            } => {
                self.write_indent();
                self.raw("switch (");
                self.expr(discriminant, 0);
                self.raw(") {");
                self.raw_newline();
                self.indent_level += 1;
                for case in cases {
                    self.write_indent();
                    match &case.test {
                        Some(test) => {
                            self.raw("case ");
                            self.expr(test, 0);
                            self.raw(":");
                        }
                        None => self.raw("default:"),
                    }
                    self.raw_newline();
                    self.render_block(&case.body);
                }
                self.indent_level -= 1;
                self.writeln("}");
            }
            JsStmt::CountedFor { var, limit, body } => {
                self.write_indent();
                self.raw(&format!("for (let {} = 0; {} < ", var, var));
                self.expr(limit, 11);
                self.raw(&format!("; {}++) {{", var));
                self.raw_newline();
                self.render_block(body);
                self.writeln("}");
            }
            JsStmt::Function { name, params, body } => {
                self.write_indent();
                self.raw(&format!("function {}({}) {{", name, params.join(", ")));
                self.raw_newline();
                self.render_block(body);
                self.writeln("}");
            }
            JsStmt::Debugger => self.writeln("debugger;"),
            JsStmt::Raw(source) => {
                for line in source.lines() {
                    if line.trim().is_empty() {
                        self.newline();
                    } else {
                        self.writeln(line);
                    }
                }
            }
        }
    }

    fn render_block(&mut self, body: &[JsStmt]) {
        self.indent_level += 1;
        for stmt in body {
            self.render_stmt(stmt);
        }
        self.indent_level -= 1;
    }

    // ---- Expressions ----

    /// Print `expr`, parenthesised when it binds looser than `min_precedence`.
    fn expr(&mut self, expr: &JsExpr, min_precedence: u8) {
        let parens = expr.precedence() < min_precedence;
        if parens {
            self.raw("(");
        }
        match expr {
            JsExpr::Int(v) => self.raw(&v.to_string()),
            JsExpr::Number(v) => self.raw(&format_number(*v)),
            JsExpr::String(s) => self.raw(&format!("\"{}\"", escape_js_string(s))),
            JsExpr::Bool(b) => self.raw(if *b { "true" } else { "false" }),
            JsExpr::Null => self.raw("null"),
            JsExpr::Undefined => self.raw("undefined"),
            JsExpr::Ident(name) => self.raw(name),
            JsExpr::This => self.raw("this"),
            JsExpr::Member { object, property } => {
                // `1.foo` would lex as a number
                let min = if matches!(**object, JsExpr::Int(_) | JsExpr::Number(_)) { 19 } else { 18 };
                self.expr(object, min);
                if is_identifier(property) {
                    self.raw(".");
                    self.raw(property);
                } else {
                    self.raw(&format!("[\"{}\"]", escape_js_string(property)));
                }
            }
            JsExpr::Index { object, index } => {
                self.expr(object, 18);
                self.raw("[");
                self.expr(index, 0);
                self.raw("]");
            }
            JsExpr::Call { callee, args } => {
                self.expr(callee, 18);
                self.args(args);
            }
            JsExpr::New { callee, args } => {
                self.raw("new ");
                self.expr(callee, 19);
                self.args(args);
            }
            JsExpr::Binary { op, lhs, rhs } => {
                let p = op.precedence();
                self.expr(lhs, p);
                self.raw(&format!(" {} ", op.as_str()));
                self.expr(rhs, p + 1);
            }
            JsExpr::Unary { op, operand } => {
                self.raw(op.as_str());
                // `- -x` must not collapse into `--x`
                let negative_operand = match &**operand {
                    JsExpr::Unary { op: UnaryOp::Neg, .. } => true,
                    JsExpr::Int(v) => *v < 0,
                    JsExpr::Number(v) => v.is_sign_negative() && !v.is_nan(),
                    _ => false,
                };
                let min = if *op == UnaryOp::Neg && negative_operand { 16 } else { 15 };
                self.expr(operand, min);
            }
            JsExpr::Conditional {
                cond,
                then,
                otherwise,
            } => {
                self.expr(cond, 4);
                self.raw(" ? ");
                self.expr(then, 2);
                self.raw(" : ");
                self.expr(otherwise, 2);
            }
            JsExpr::Assign { target, value } => {
                self.expr(target, 18);
                self.raw(" = ");
                self.expr(value, 2);
            }
            JsExpr::Array(elements) => {
                self.raw("[");
                for (i, element) in elements.iter().enumerate() {
                    if i > 0 {
                        self.raw(", ");
                    }
                    self.expr(element, 2);
                }
                self.raw("]");
            }
            JsExpr::Object(entries) => {
                if entries.is_empty() {
                    self.raw("{}");
                } else {
                    self.raw("{ ");
                    for (i, (key, value)) in entries.iter().enumerate() {
                        if i > 0 {
                            self.raw(", ");
                        }
                        if is_identifier(key) {
                            self.raw(key);
                        } else {
                            self.raw(&format!("\"{}\"", escape_js_string(key)));
                        }
                        self.raw(": ");
                        self.expr(value, 2);
                    }
                    self.raw(" }");
                }
            }
            JsExpr::Function { params, body } => {
                self.raw(&format!("function ({}) {{", params.join(", ")));
                if body.is_empty() {
                    self.raw("}");
                } else {
                    self.raw_newline();
                    self.render_block(body);
                    self.write_indent();
                    self.raw("}");
                }
            }
        }
        if parens {
            self.raw(")");
        }
    }

    fn args(&mut self, args: &[JsExpr]) {
        self.raw("(");
        for (i, arg) in args.iter().enumerate() {
            if i > 0 {
                self.raw(", ");
            }
            self.expr(arg, 2);
        }
        self.raw(")");
    }

    // ---- Output helpers ----

    fn write_indent(&mut self) {
        for _ in 0..self.indent_level {
            self.output.push_str(&self.config.indent);
        }
    }

    fn writeln(&mut self, text: &str) {
        self.write_indent();
        self.output.push_str(text);
        self.output.push('\n');
    }

    fn newline(&mut self) {
        self.output.push('\n');
    }

    fn raw(&mut self, text: &str) {
        self.output.push_str(text);
    }

    fn raw_newline(&mut self) {
        self.output.push('\n');
    }
}

/// Render a program with the given configuration.
pub fn print_program(stmts: &[JsStmt], config: RenderConfig) -> String {
    JsPrinter::new(config).render_program(stmts)
}

/// Render an expression with the default configuration.
pub fn print_expr(expr: &JsExpr) -> String {
    JsPrinter::new(RenderConfig::default()).render_expr(expr)
}

/// Shortest source text that reads back as exactly `v`.
pub fn format_number(v: f64) -> String {
    if v.is_nan() {
        "NaN".into()
    } else if v.is_infinite() {
        if v > 0.0 { "Infinity".into() } else { "-Infinity".into() }
    } else if v == 0.0 && v.is_sign_negative() {
        "-0".into()
    } else {
        format!("{}", v)
    }
}

pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

pub fn escape_js_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{2028}' | '\u{2029}' => {
                let _ = write!(out, "\\u{:04x}", ch as u32);
            }
            c if c.is_control() => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out
}
