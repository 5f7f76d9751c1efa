//! Go-binding lowering.
//!
//! `a, b := go f(x)` becomes one SyncState per bound name, argument capture
//! in the calling goroutine, and a dispatched goroutine that delivers each
//! result exactly once. Later receives `<-a` in the same lexical scope read
//! through the state instead of a channel.

use crate::{
    config::LowerOptions,
    language::{
        ast::*,
        errors::LowerError,
        span::Span,
        types::TypeExpr,
    },
    lower::{
        finish,
        signatures::{SignatureTable, TypeEnv},
        walk, ImportSet, NameGen,
    },
};
use log::{debug, trace};
use std::collections::HashSet;

type Active = HashSet<String>;

pub fn lower_program(
    program: &mut Program,
    table: &SignatureTable,
    options: &LowerOptions,
    imports: &mut ImportSet,
) -> Result<(), Vec<LowerError>> {
    let mut errors = Vec::new();
    let mut uses_runtime = false;
    for item in &mut program.items {
        let Item::Function(def) = item else {
            continue;
        };
        if !block_has_binding(&def.body) {
            continue;
        }
        let mut lowerer = Lowerer {
            table,
            env: TypeEnv::for_function(def, table),
            options,
            names: NameGen::new(options.hidden_prefix.clone(), walk::collect_names(def)),
            errors: &mut errors,
            lowered: 0,
        };
        let body = std::mem::take(&mut def.body);
        def.body = lowerer.rewrite_block(body, Active::new());
        debug!("`{}`: lowered {} go-binding(s)", def.name, lowerer.lowered);
        uses_runtime |= lowerer.lowered > 0;
    }
    finish(errors)?;

    if uses_runtime {
        imports.require("sync");
        let present = program
            .items
            .iter()
            .any(|item| matches!(item, Item::Runtime(RuntimeSupport::SyncState { .. })));
        if !present {
            program.items.push(Item::Runtime(RuntimeSupport::SyncState {
                prefix: options.hidden_prefix.clone(),
            }));
        }
    }
    Ok(())
}

fn block_has_binding(block: &Block) -> bool {
    block.statements.iter().any(|stmt| {
        let nested = match stmt {
            Statement::GoBinding(_) => return true,
            Statement::If(if_stmt) => if_has_binding(if_stmt),
            Statement::For(for_stmt) => block_has_binding(&for_stmt.body),
            Statement::Block(block) => block_has_binding(block),
            _ => false,
        };
        let mut in_literal = false;
        walk::visit_statement(stmt, &mut |expr| {
            if let Expr::FuncLit(lit) = expr {
                in_literal |= block_has_binding(&lit.body);
                return false;
            }
            !in_literal
        });
        nested || in_literal
    })
}

fn if_has_binding(if_stmt: &IfStmt) -> bool {
    block_has_binding(&if_stmt.then_branch)
        || match &if_stmt.else_branch {
            Some(ElseBranch::Block(block)) => block_has_binding(block),
            Some(ElseBranch::ElseIf(nested)) => if_has_binding(nested),
            None => false,
        }
}

/// Arguments that evaluate the same whenever they are evaluated.
fn is_constant(expr: &Expr) -> bool {
    matches!(expr, Expr::Literal(_) | Expr::Type(..))
}

fn active_receive<'e>(expr: &'e Expr, active: &Active) -> Option<&'e str> {
    match expr {
        Expr::Unary {
            op: UnaryOp::Receive,
            expr,
            ..
        } => expr.as_identifier().filter(|name| active.contains(*name)),
        _ => None,
    }
}

fn method_call(receiver: &str, method: &str, args: Vec<Expr>) -> Expr {
    Expr::call(Expr::selector(Expr::ident(receiver), method), args)
}

struct Lowerer<'a> {
    table: &'a SignatureTable,
    env: TypeEnv,
    options: &'a LowerOptions,
    names: NameGen,
    errors: &'a mut Vec<LowerError>,
    lowered: usize,
}

impl Lowerer<'_> {
    fn rewrite_block(&mut self, block: Block, mut active: Active) -> Block {
        let mut statements = Vec::with_capacity(block.statements.len());
        for stmt in block.statements {
            self.rewrite_statement(stmt, &mut active, &mut statements);
        }
        Block {
            statements,
            span: block.span,
        }
    }

    fn rewrite_statement(&mut self, stmt: Statement, active: &mut Active, out: &mut Vec<Statement>) {
        match stmt {
            Statement::GoBinding(GoBindingStmt { names, call, span }) => {
                let call = self.reads(call, active);
                self.lower_binding(&names, call, span, out);
                for name in names.iter().filter(|name| !name.is_blank()) {
                    active.insert(name.name.clone());
                }
            }
            Statement::Assign(assign) => {
                if let ([_, _], [value]) = (assign.targets.as_slice(), assign.values.as_slice()) {
                    self.reject_comma_ok(value, active);
                }
                let AssignStmt {
                    targets,
                    op,
                    values,
                    span,
                } = assign;
                let values = values.into_iter().map(|v| self.reads(v, active)).collect();
                let targets = targets.into_iter().map(|t| self.reads(t, active)).collect::<Vec<_>>();
                if op == AssignOp::Define {
                    for name in targets.iter().filter_map(Expr::as_identifier) {
                        active.remove(name);
                    }
                }
                out.push(Statement::Assign(AssignStmt {
                    targets,
                    op,
                    values,
                    span,
                }));
            }
            Statement::Var(var) => {
                if let ([_, _], [value]) = (var.names.as_slice(), var.values.as_slice()) {
                    self.reject_comma_ok(value, active);
                }
                let values = var.values.into_iter().map(|v| self.reads(v, active)).collect();
                for name in &var.names {
                    active.remove(&name.name);
                }
                out.push(Statement::Var(VarStmt { values, ..var }));
            }
            Statement::Expr(ExprStmt { expr }) => out.push(Statement::expr(self.reads(expr, active))),
            Statement::Return(ReturnStmt { values, span }) => out.push(Statement::Return(ReturnStmt {
                values: values.into_iter().map(|v| self.reads(v, active)).collect(),
                span,
            })),
            Statement::Throw(ThrowStmt { value, span }) => out.push(Statement::Throw(ThrowStmt {
                value: self.reads(value, active),
                span,
            })),
            Statement::Go(GoStmt { call, span }) => out.push(Statement::Go(GoStmt {
                call: self.reads(call, active),
                span,
            })),
            Statement::Defer(DeferStmt { call, span }) => out.push(Statement::Defer(DeferStmt {
                call: self.reads(call, active),
                span,
            })),
            Statement::If(if_stmt) => out.push(Statement::If(self.rewrite_if(if_stmt, active))),
            Statement::For(for_stmt) => out.push(self.rewrite_for(for_stmt, active)),
            Statement::Block(block) => out.push(Statement::Block(self.rewrite_block(block, active.clone()))),
            stmt @ (Statement::Break(_) | Statement::Continue(_)) => out.push(stmt),
        }
    }

    fn reject_comma_ok(&mut self, value: &Expr, active: &Active) {
        if let Some(name) = active_receive(value, active) {
            self.errors.push(
                LowerError::unsupported(
                    value.span(),
                    format!("comma-ok receive from go-binding `{name}`"),
                )
                .with_help("a go-binding always delivers exactly one value; use `<-name`"),
            );
        }
    }

    fn rewrite_if(&mut self, if_stmt: IfStmt, active: &Active) -> IfStmt {
        IfStmt {
            condition: self.reads(if_stmt.condition, active),
            then_branch: self.rewrite_block(if_stmt.then_branch, active.clone()),
            else_branch: if_stmt.else_branch.map(|branch| match branch {
                ElseBranch::Block(block) => ElseBranch::Block(self.rewrite_block(block, active.clone())),
                ElseBranch::ElseIf(nested) => ElseBranch::ElseIf(Box::new(self.rewrite_if(*nested, active))),
            }),
            span: if_stmt.span,
        }
    }

    fn rewrite_for(&mut self, for_stmt: ForStmt, active: &Active) -> Statement {
        let ForStmt { clause, body, span } = for_stmt;
        let mut scope = active.clone();
        let clause = match clause {
            ForClause::Infinite => ForClause::Infinite,
            ForClause::Condition(condition) => ForClause::Condition(self.reads(condition, &scope)),
            ForClause::ThreeClause {
                init,
                condition,
                post,
            } => {
                let init = init.and_then(|init| self.loop_header(*init, &mut scope));
                let condition = condition.map(|condition| self.reads(condition, &scope));
                let post = post.and_then(|post| self.loop_header(*post, &mut scope));
                ForClause::ThreeClause {
                    init,
                    condition,
                    post,
                }
            }
            ForClause::Range {
                key,
                value,
                define,
                iterable,
            } => {
                if let Some(name) = iterable.as_identifier().filter(|name| scope.contains(*name)) {
                    self.errors.push(LowerError::unsupported(
                        iterable.span(),
                        format!("`range` over go-binding `{name}`"),
                    ));
                }
                let iterable = self.reads(iterable, &scope);
                if define {
                    for name in key.iter().chain(value.iter()) {
                        scope.remove(&name.name);
                    }
                }
                ForClause::Range {
                    key,
                    value,
                    define,
                    iterable,
                }
            }
        };
        let body = self.rewrite_block(body, scope);
        Statement::For(ForStmt { clause, body, span })
    }

    fn loop_header(&mut self, stmt: Statement, scope: &mut Active) -> Option<Box<Statement>> {
        if let Statement::GoBinding(binding) = &stmt {
            self.errors.push(LowerError::unsupported(
                binding.span,
                "go-binding in a loop header",
            ));
            return Some(Box::new(stmt));
        }
        let mut lowered = Vec::new();
        self.rewrite_statement(stmt, scope, &mut lowered);
        lowered.pop().map(Box::new)
    }

    /// Rewrites `<-name` for active bindings into `name.get()`.
    fn reads(&mut self, expr: Expr, active: &Active) -> Expr {
        if active.is_empty() && !expr_has_binding(&expr) {
            return expr;
        }
        walk::map_expr_shallow(expr, &mut |node| match node {
            Expr::Unary {
                op: UnaryOp::Receive,
                expr,
                span,
            } => match expr.as_identifier() {
                Some(name) if active.contains(name) => Expr::Call {
                    callee: Box::new(Expr::selector(*expr, "get")),
                    args: Vec::new(),
                    span,
                },
                _ => Expr::Unary {
                    op: UnaryOp::Receive,
                    expr,
                    span,
                },
            },
            Expr::FuncLit(lit) => {
                let mut lit = *lit;
                let mut inner = active.clone();
                for param in &lit.params {
                    inner.remove(&param.name);
                }
                lit.body = self.rewrite_block(lit.body, inner);
                Expr::FuncLit(Box::new(lit))
            }
            other => other,
        })
    }

    fn lower_binding(&mut self, names: &[Identifier], call: Expr, span: Span, out: &mut Vec<Statement>) {
        let Expr::Call {
            callee,
            args,
            span: call_span,
        } = call
        else {
            self.errors.push(LowerError::unsupported(
                span,
                "a go-binding must dispatch a function call",
            ));
            return;
        };
        let Some(sig) = self.table.resolve_call(&callee, &self.env).cloned() else {
            self.errors.push(
                LowerError::unsupported(
                    callee.span(),
                    "go-binding callee is not a function or method declared in this program unit",
                )
                .with_help("wrap the call in a local function to bind its results"),
            );
            return;
        };
        let slots = sig.lowered_slots();
        if names.len() != slots.len() {
            self.errors.push(LowerError::arity(
                span,
                format!(
                    "`{}` returns {} value(s) but the go-binding names {}",
                    sig.name,
                    slots.len(),
                    names.len()
                ),
            ));
            return;
        }
        if sig.is_result && names.iter().all(Identifier::is_blank) {
            self.errors.push(LowerError::discarded_result(call_span, &sig.name));
            return;
        }

        let states: Vec<(&str, &TypeExpr)> = names
            .iter()
            .zip(&slots)
            .filter(|(name, _)| !name.is_blank())
            .map(|(name, ty)| (name.name.as_str(), ty))
            .collect();
        for (state, ty) in &states {
            let constructor = Expr::index(
                Expr::ident(self.options.hidden("NewSync")),
                Expr::Type((*ty).clone(), Span::default()),
            );
            out.push(Statement::define(&[*state], vec![Expr::call(constructor, Vec::new())]));
        }

        // Function value and arguments are evaluated before dispatch, as `go f(x)` does.
        let callee = match *callee {
            selector @ Expr::Selector { .. } => self.capture(selector, out),
            other => other,
        };
        let args = args
            .into_iter()
            .map(|arg| {
                if is_constant(&arg) {
                    arg
                } else {
                    self.capture(arg, out)
                }
            })
            .collect();
        let call = Expr::Call {
            callee: Box::new(callee),
            args,
            span: call_span,
        };

        let mut body = Vec::new();
        if states.is_empty() {
            body.push(Statement::expr(call));
        } else {
            let failure = self.names.fresh("Fail");
            let fan_out = states
                .iter()
                .map(|(state, _)| Statement::expr(method_call(state, "fail", vec![Expr::ident(&failure)])))
                .collect();
            let recover = FuncLit {
                params: Vec::new(),
                returns: None,
                body: Block::new(vec![
                    Statement::define(
                        &[failure.as_str()],
                        vec![Expr::call(Expr::ident("recover"), Vec::new())],
                    ),
                    Statement::if_then(
                        Expr::binary(BinaryOp::NotEq, Expr::ident(&failure), Expr::nil()),
                        fan_out,
                    ),
                ]),
                span,
            };
            body.push(Statement::Defer(DeferStmt {
                call: Expr::call(Expr::FuncLit(Box::new(recover)), Vec::new()),
                span,
            }));

            let values: Vec<String> = names
                .iter()
                .map(|name| {
                    if name.is_blank() {
                        "_".to_string()
                    } else {
                        self.names.fresh("Val")
                    }
                })
                .collect();
            let targets: Vec<&str> = values.iter().map(String::as_str).collect();
            body.push(Statement::define(&targets, vec![call]));
            for (name, value) in names.iter().zip(&values) {
                if !name.is_blank() {
                    body.push(Statement::expr(method_call(
                        &name.name,
                        "put",
                        vec![Expr::ident(value)],
                    )));
                }
            }
        }

        let task = FuncLit {
            params: Vec::new(),
            returns: None,
            body: Block::new(body),
            span,
        };
        out.push(Statement::Go(GoStmt {
            call: Expr::call(Expr::FuncLit(Box::new(task)), Vec::new()),
            span,
        }));
        trace!(
            "dispatched `{}` for {} sync state(s)",
            sig.name,
            states.len()
        );
        self.lowered += 1;
    }

    fn capture(&mut self, expr: Expr, out: &mut Vec<Statement>) -> Expr {
        let name = self.names.fresh("Arg");
        out.push(Statement::define(&[name.as_str()], vec![expr]));
        Expr::ident(name)
    }
}

fn expr_has_binding(expr: &Expr) -> bool {
    let mut found = false;
    walk::visit_expr(expr, &mut |node| {
        if let Expr::FuncLit(lit) = node {
            found |= block_has_binding(&lit.body);
            return false;
        }
        !found
    });
    found
}
