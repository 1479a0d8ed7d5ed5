// ABOUTME: XML pretty-printer walking the AST into tagged markup

use crate::ast::{BinaryOp, Expr, ExprKind, Param, Stmt, StmtKind};
use std::io::{self, Write};

/// Writes the AST as an indented XML tree: one element per node variant,
/// children nested, scalar payloads as element text.
pub fn write_xml<W: Write>(stmt: &Stmt, out: &mut W) -> io::Result<()> {
    XmlWriter {
        out,
        indent_level: 0,
    }
    .statement(stmt)
}

const INDENT_SPACES: usize = 4;

struct XmlWriter<'a, W: Write> {
    out: &'a mut W,
    indent_level: usize,
}

impl<W: Write> XmlWriter<'_, W> {
    fn leaf(&mut self, tag: &str, text: &str) -> io::Result<()> {
        let pad = self.indent_level * INDENT_SPACES;
        writeln!(self.out, "{:pad$}<{tag}>{}</{tag}>", "", escape(text))
    }

    fn open(&mut self, tag: &str) -> io::Result<()> {
        let pad = self.indent_level * INDENT_SPACES;
        writeln!(self.out, "{:pad$}<{tag}>", "")?;
        self.indent_level += 1;
        Ok(())
    }

    fn close(&mut self, tag: &str) -> io::Result<()> {
        self.indent_level -= 1;
        let pad = self.indent_level * INDENT_SPACES;
        writeln!(self.out, "{:pad$}</{tag}>", "")
    }

    fn nested(
        &mut self,
        tag: &str,
        body: impl FnOnce(&mut Self) -> io::Result<()>,
    ) -> io::Result<()> {
        self.open(tag)?;
        body(self)?;
        self.close(tag)
    }

    fn parameters(&mut self, params: &[Param]) -> io::Result<()> {
        for param in params {
            self.nested("parameter", |w| {
                w.leaf("name", &param.name)?;
                if let Some(default) = &param.default {
                    w.nested("default", |w| w.expression(default))?;
                }
                Ok(())
            })?;
        }
        Ok(())
    }

    fn expression(&mut self, expr: &Expr) -> io::Result<()> {
        match &expr.kind {
            ExprKind::Variable(name) => self.leaf("variable", name),
            ExprKind::Int(n) => self.leaf("int", &n.to_string()),
            ExprKind::Real(d) => self.leaf("real", &d.to_string()),
            ExprKind::Str(s) => self.leaf("string", s),
            ExprKind::Bool(b) => self.leaf("bool", &b.to_string()),
            ExprKind::Array(values) => self.nested("array", |w| {
                values.iter().try_for_each(|v| w.expression(v))
            }),
            ExprKind::Neg(child) => self.nested("negation", |w| w.expression(child)),
            ExprKind::Abs(child) => self.nested("abs", |w| w.expression(child)),
            ExprKind::Binary { op, left, right } => {
                self.nested(binary_tag(*op), |w| {
                    w.expression(left)?;
                    w.expression(right)
                })
            }
            ExprKind::Call { callee, args } => self.nested("call", |w| {
                w.nested("callee", |w| w.expression(callee))?;
                w.nested("arguments", |w| {
                    args.iter().try_for_each(|a| w.expression(a))
                })
            }),
            ExprKind::FunctionDef { name, params, body } => {
                self.nested("function_definition", |w| {
                    w.leaf("name", name)?;
                    w.parameters(params)?;
                    w.nested("body", |w| w.statement(body))
                })
            }
            ExprKind::NativeDef {
                symbol,
                library,
                result,
                args,
            } => self.nested("native_definition", |w| {
                w.leaf("symbol", symbol)?;
                w.leaf("library", library)?;
                w.leaf("result", result)?;
                args.iter().try_for_each(|a| w.leaf("argument", a))
            }),
            ExprKind::Conditional {
                condition,
                then_branch,
                else_branch,
            } => self.nested("conditional", |w| {
                w.expression(condition)?;
                w.expression(then_branch)?;
                w.expression(else_branch)
            }),
            ExprKind::Subscript { target, index } => self.nested("subscript", |w| {
                w.expression(target)?;
                w.expression(index)
            }),
            ExprKind::Element { target, name } => self.nested("element_selection", |w| {
                w.expression(target)?;
                w.leaf("name", name)
            }),
        }
    }

    fn statement(&mut self, stmt: &Stmt) -> io::Result<()> {
        match &stmt.kind {
            StmtKind::Expression(expr) => {
                self.nested("expression_statement", |w| w.expression(expr))
            }
            StmtKind::Sequence(stmts) => self.nested("statement_sequence", |w| {
                stmts.iter().try_for_each(|s| w.statement(s))
            }),
            StmtKind::Return(expr) => self.nested("return_statement", |w| w.expression(expr)),
            StmtKind::If { arms, otherwise } => self.nested("if_statement", |w| {
                for (condition, branch) in arms {
                    w.nested("condition", |w| w.expression(condition))?;
                    w.nested("branch", |w| w.statement(branch))?;
                }
                if let Some(branch) = otherwise {
                    w.nested("else", |w| w.statement(branch))?;
                }
                Ok(())
            }),
            StmtKind::While { condition, body } => self.nested("while_statement", |w| {
                w.nested("condition", |w| w.expression(condition))?;
                w.nested("body", |w| w.statement(body))
            }),
            StmtKind::FunctionDef { name, params, body } => {
                self.nested("function_definition_statement", |w| {
                    w.leaf("name", name)?;
                    w.parameters(params)?;
                    w.nested("body", |w| w.statement(body))
                })
            }
            StmtKind::Assign { target, value } => self.nested("assignment_statement", |w| {
                w.expression(target)?;
                w.expression(value)
            }),
        }
    }
}

fn binary_tag(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::Add => "addition",
        BinaryOp::Sub => "subtraction",
        BinaryOp::Mul => "multiplication",
        BinaryOp::Div => "division",
        BinaryOp::Lt => "less_than",
        BinaryOp::Le => "less_equal",
        BinaryOp::Gt => "greater_than",
        BinaryOp::Ge => "greater_equal",
        BinaryOp::Eq => "equality",
        BinaryOp::Neq => "inequality",
        BinaryOp::Concat => "concatenation",
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_program;

    fn render(source: &str) -> String {
        let program = parse_program(source).unwrap();
        let mut out = Vec::new();
        write_xml(&program, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_assignment_markup() {
        let xml = render("x = 1 + 2;");
        assert!(xml.contains("<assignment_statement>"));
        assert!(xml.contains("<variable>x</variable>"));
        assert!(xml.contains("<addition>"));
        assert!(xml.contains("<int>1</int>"));
    }

    #[test]
    fn test_nested_indentation() {
        let xml = render("x = 1;");
        let lines: Vec<&str> = xml.lines().collect();
        assert_eq!(lines[0], "<statement_sequence>");
        assert!(lines[1].starts_with("    <assignment_statement>"));
        assert!(lines[2].starts_with("        <variable>"));
    }

    #[test]
    fn test_string_payload_is_escaped() {
        let xml = render("s = \"a<b\";");
        assert!(xml.contains("<string>a&lt;b</string>"));
    }

    #[test]
    fn test_function_definition_markup() {
        let xml = render("function f(a, b = 1) { return a; }");
        assert!(xml.contains("<function_definition_statement>"));
        assert!(xml.contains("<name>f</name>"));
        assert!(xml.contains("<parameter>"));
        assert!(xml.contains("<default>"));
        assert!(xml.contains("<return_statement>"));
    }
}
