// ABOUTME: Tree-walking evaluator for Vanilla expressions and statements

use crate::ast::{BinaryOp, Expr, ExprKind, Param, Stmt, StmtKind};
use crate::env::Context;
use crate::error::{Error, ErrorKind, Result};
use crate::native::NativeFunction;
use crate::parser::parse_program;
use crate::value::{FunctionValue, Parameter, Value};
use std::rc::Rc;

/// How a statement finished. A `return` raises `Return`, which sequences
/// and loops pass upward untouched; only the enclosing function call
/// collapses it into its result value.
#[derive(Debug)]
pub enum Flow {
    Normal,
    Return(Value),
}

/// Evaluates an expression against a context. Errors escaping a node are
/// tagged with that node's position unless an inner node tagged them first.
pub fn eval_expr(expr: &Expr, ctx: &mut Context) -> Result<Value> {
    eval_expr_kind(expr, ctx).map_err(|e| e.with_location(expr.line, expr.column))
}

fn eval_expr_kind(expr: &Expr, ctx: &mut Context) -> Result<Value> {
    match &expr.kind {
        ExprKind::Variable(name) => ctx.get_value(name),
        ExprKind::Int(n) => Ok(Value::Int(n.clone())),
        ExprKind::Real(d) => Ok(Value::Float(d.clone())),
        ExprKind::Str(s) => Ok(Value::Str(s.clone())),
        ExprKind::Bool(b) => Ok(Value::Bool(*b)),

        ExprKind::Array(items) => {
            let mut values = Vec::with_capacity(items.len());
            for item in items {
                values.push(eval_expr(item, ctx)?);
            }
            Ok(Value::array(values))
        }

        ExprKind::Neg(child) => eval_expr(child, ctx)?.neg(),
        ExprKind::Abs(child) => eval_expr(child, ctx)?.abs(),

        ExprKind::Binary { op, left, right } => {
            let lhs = eval_expr(left, ctx)?;
            let rhs = eval_expr(right, ctx)?;
            match op {
                BinaryOp::Add => lhs.add(&rhs),
                BinaryOp::Sub => lhs.sub(&rhs),
                BinaryOp::Mul => lhs.mul(&rhs),
                BinaryOp::Div => lhs.div(&rhs),
                BinaryOp::Lt => lhs.lt(&rhs),
                BinaryOp::Le => lhs.le(&rhs),
                BinaryOp::Gt => lhs.gt(&rhs),
                BinaryOp::Ge => lhs.ge(&rhs),
                BinaryOp::Eq => lhs.eq(&rhs),
                BinaryOp::Neq => lhs.neq(&rhs),
                BinaryOp::Concat => lhs.concat(&rhs),
            }
        }

        // Arguments evaluate left to right before the callee.
        ExprKind::Call { callee, args } => {
            let mut argv = Vec::with_capacity(args.len());
            for arg in args {
                argv.push(eval_expr(arg, ctx)?);
            }
            let function = eval_expr(callee, ctx)?;
            function.call(ctx, argv)
        }

        ExprKind::FunctionDef { name, params, body } => build_function(name, params, body, ctx),

        ExprKind::NativeDef {
            symbol,
            library,
            result,
            args,
        } => {
            let function =
                NativeFunction::new(symbol.clone(), library.clone(), result.clone(), args.clone())?;
            Ok(Value::Native(Rc::new(function)))
        }

        ExprKind::Conditional {
            condition,
            then_branch,
            else_branch,
        } => {
            if eval_expr(condition, ctx)?.to_bool()?.is_true() {
                eval_expr(then_branch, ctx)
            } else {
                eval_expr(else_branch, ctx)
            }
        }

        ExprKind::Subscript { target, index } => {
            let container = eval_expr(target, ctx)?;
            let subscript = eval_expr(index, ctx)?;
            container.subscript_get(&subscript)
        }

        ExprKind::Element { target, name } => eval_expr(target, ctx)?.element_get(name),
    }
}

/// Executes a statement. Returns whether control flows on normally or a
/// `return` is unwinding toward the enclosing call frame.
pub fn exec_stmt(stmt: &Stmt, ctx: &mut Context) -> Result<Flow> {
    exec_stmt_kind(stmt, ctx).map_err(|e| e.with_location(stmt.line, stmt.column))
}

fn exec_stmt_kind(stmt: &Stmt, ctx: &mut Context) -> Result<Flow> {
    match &stmt.kind {
        StmtKind::Expression(expr) => {
            eval_expr(expr, ctx)?;
            Ok(Flow::Normal)
        }

        StmtKind::Sequence(stmts) => {
            for child in stmts {
                match exec_stmt(child, ctx)? {
                    Flow::Normal => {}
                    returned => return Ok(returned),
                }
            }
            Ok(Flow::Normal)
        }

        StmtKind::Return(expr) => Ok(Flow::Return(eval_expr(expr, ctx)?)),

        StmtKind::If { arms, otherwise } => {
            for (condition, branch) in arms {
                if eval_expr(condition, ctx)?.to_bool()?.is_true() {
                    return exec_stmt(branch, ctx);
                }
            }
            match otherwise {
                Some(branch) => exec_stmt(branch, ctx),
                None => Ok(Flow::Normal),
            }
        }

        StmtKind::While { condition, body } => {
            while eval_expr(condition, ctx)?.to_bool()?.is_true() {
                match exec_stmt(body, ctx)? {
                    Flow::Normal => {}
                    returned => return Ok(returned),
                }
            }
            Ok(Flow::Normal)
        }

        StmtKind::FunctionDef { name, params, body } => {
            let function = build_function(name, params, body, ctx)
                .map_err(|e| e.with_location(stmt.line, stmt.column))?;
            ctx.set_value(name.clone(), function);
            Ok(Flow::Normal)
        }

        StmtKind::Assign { target, value } => match &target.kind {
            ExprKind::Variable(name) => {
                let rhs = eval_expr(value, ctx)?;
                ctx.set_value(name.clone(), rhs);
                Ok(Flow::Normal)
            }
            _ => Err(Error::at(
                ErrorKind::InvalidAssignmentTarget,
                target.line,
                target.column,
            )),
        },
    }
}

/// Builds a function value from a definition node: parameter defaults are
/// evaluated once, here, against the defining context.
fn build_function(
    name: &str,
    params: &[Param],
    body: &Rc<Stmt>,
    ctx: &mut Context,
) -> Result<Value> {
    let mut parameters = Vec::with_capacity(params.len());
    for param in params {
        let default = match &param.default {
            Some(expr) => Some(eval_expr(expr, ctx)?),
            None => None,
        };
        parameters.push(Parameter {
            name: param.name.clone(),
            default,
        });
    }
    let function = FunctionValue::new(name.to_string(), parameters, Rc::clone(body))?;
    Ok(Value::Function(Rc::new(function)))
}

/// Parses and runs a whole source text against the given context.
pub fn run_source(source: &str, ctx: &mut Context) -> Result<()> {
    let program = parse_program(source)?;
    exec_stmt(&program, ctx)?;
    Ok(())
}
