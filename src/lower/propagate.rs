//! Error-propagation rewriting: `throw`, `try` and Result-shaped returns.
//!
//! Every `try` is hoisted out of its statement into a capture of all return
//! values plus an early-return check. Operands evaluated before a hoisted
//! `try` that may have side effects are spilled into hidden temporaries first,
//! so the rewritten statement evaluates everything once and in source order.

use crate::{
    config::LowerOptions,
    language::{
        ast::*,
        errors::{LowerError, LowerErrorKind},
        span::Span,
        types::TypeExpr,
    },
    lower::{
        finish, interpolate,
        signatures::{FnSignature, SignatureTable, TypeEnv},
        types::{lower_return, zero_value, ReturnShape},
        walk, ImportSet, NameGen,
    },
};
use log::trace;
use std::mem;

pub fn rewrite_program(
    program: &mut Program,
    table: &SignatureTable,
    options: &LowerOptions,
    imports: &mut ImportSet,
) -> Result<(), Vec<LowerError>> {
    let mut errors = Vec::new();
    for item in &mut program.items {
        match item {
            Item::Function(def) => {
                let Some(sig) = table.get(&def.signature_key()) else {
                    continue;
                };
                let frame = Frame::new(&def.name, &sig.value_slots, sig.is_result, table);
                def.returns = sig.lowered_return();
                let mut rewriter = Rewriter {
                    table,
                    env: TypeEnv::for_function(def, table),
                    options,
                    imports: &mut *imports,
                    names: NameGen::new(options.hidden_prefix.clone(), walk::collect_names(def)),
                    frame,
                    errors: &mut errors,
                };
                def.body = rewriter.rewrite_block(mem::take(&mut def.body));
            }
            Item::Const(def) if walk::contains_try(&def.value) => errors.push(LowerError::unsupported(
                def.value.span(),
                format!("`try` in the initializer of constant `{}`", def.name),
            )),
            _ => {}
        }
    }
    finish(errors)
}

/// The function whose return shape `throw` and `try` target.
struct Frame {
    function: String,
    is_result: bool,
    value_count: usize,
    zeros: Vec<Expr>,
}

impl Frame {
    fn new(function: &str, value_slots: &[TypeExpr], is_result: bool, table: &SignatureTable) -> Self {
        Self {
            function: function.to_string(),
            is_result,
            value_count: value_slots.len(),
            zeros: value_slots.iter().map(|ty| zero_value(ty, table)).collect(),
        }
    }
}

/// No calls or receives outside nested function literals.
fn is_pure(expr: &Expr) -> bool {
    let mut pure = true;
    walk::visit_expr(expr, &mut |node| {
        match node {
            Expr::Call { .. }
            | Expr::Unary {
                op: UnaryOp::Receive,
                ..
            } => pure = false,
            Expr::FuncLit(_) => return false,
            _ => {}
        }
        pure
    });
    pure
}

struct Rewriter<'a> {
    table: &'a SignatureTable,
    env: TypeEnv,
    options: &'a LowerOptions,
    imports: &'a mut ImportSet,
    names: NameGen,
    frame: Frame,
    errors: &'a mut Vec<LowerError>,
}

impl Rewriter<'_> {
    fn rewrite_block(&mut self, block: Block) -> Block {
        let mut statements = Vec::with_capacity(block.statements.len());
        for stmt in block.statements {
            self.rewrite_statement(stmt, &mut statements);
        }
        Block {
            statements,
            span: block.span,
        }
    }

    fn rewrite_statement(&mut self, stmt: Statement, out: &mut Vec<Statement>) {
        let mut pre = Vec::new();
        let rewritten = match stmt {
            Statement::Expr(ExprStmt {
                expr: Expr::Try { expr, span },
            }) => {
                self.lower_try(*expr, span, true, &mut pre);
                None
            }
            Statement::Expr(ExprStmt { expr }) => {
                self.check_discarded(&expr);
                Some(Statement::expr(self.lower_expr(expr, &mut pre)))
            }
            Statement::Assign(assign) => Some(self.rewrite_assign(assign, &mut pre)),
            Statement::Var(var) => Some(self.rewrite_var(var, &mut pre)),
            Statement::Return(ReturnStmt { values, span }) => {
                let values = if self.frame.is_result {
                    self.result_return(values, span, &mut pre)
                } else {
                    self.lower_ordered(values, &mut pre)
                };
                Some(Statement::Return(ReturnStmt { values, span }))
            }
            Statement::Throw(ThrowStmt { value, span }) => {
                if self.frame.is_result {
                    let value = self.lower_expr(value, &mut pre);
                    let error = self.error_value(value);
                    Some(self.early_return(error, span))
                } else {
                    self.errors.push(
                        LowerError::new(
                            LowerErrorKind::ThrowWithoutResultType,
                            span,
                            format!(
                                "`throw` in `{}`, whose return type is not a Result",
                                self.frame.function
                            ),
                        )
                        .with_help("declare the return type as Result<T> to allow throwing"),
                    );
                    None
                }
            }
            Statement::If(if_stmt) => Some(Statement::If(self.rewrite_if(if_stmt, &mut pre))),
            Statement::For(for_stmt) => {
                self.rewrite_for(for_stmt, out);
                None
            }
            Statement::GoBinding(GoBindingStmt { names, call, span }) => {
                let call = self.lower_dispatched(call, "go", &mut pre);
                Some(Statement::GoBinding(GoBindingStmt { names, call, span }))
            }
            Statement::Go(GoStmt { call, span }) => {
                self.check_discarded(&call);
                let call = self.lower_dispatched(call, "go", &mut pre);
                Some(Statement::Go(GoStmt { call, span }))
            }
            Statement::Defer(DeferStmt { call, span }) => {
                self.check_discarded(&call);
                let call = self.lower_dispatched(call, "defer", &mut pre);
                Some(Statement::Defer(DeferStmt { call, span }))
            }
            Statement::Block(block) => Some(Statement::Block(self.rewrite_block(block))),
            stmt @ (Statement::Break(_) | Statement::Continue(_)) => Some(stmt),
        };
        out.extend(pre);
        out.extend(rewritten);
    }

    fn rewrite_assign(&mut self, assign: AssignStmt, pre: &mut Vec<Statement>) -> Statement {
        let AssignStmt {
            targets,
            op,
            mut values,
            span,
        } = assign;
        let values_try = values.iter().any(walk::contains_try);
        let targets = targets
            .into_iter()
            .map(|target| self.lower_target(target, values_try, pre))
            .collect::<Vec<_>>();

        let values = if targets.len() > 1 && values.len() == 1 && matches!(values[0], Expr::Try { .. }) {
            match values.pop() {
                Some(Expr::Try { expr, span: try_span }) => {
                    self.destructure_try(*expr, try_span, targets.len(), pre)
                }
                _ => values,
            }
        } else {
            self.check_capture(&values, targets.len());
            self.lower_ordered(values, pre)
        };
        Statement::Assign(AssignStmt {
            targets,
            op,
            values,
            span,
        })
    }

    fn rewrite_var(&mut self, var: VarStmt, pre: &mut Vec<Statement>) -> Statement {
        let VarStmt {
            names,
            ty,
            mut values,
            span,
        } = var;
        let values = if names.len() > 1 && values.len() == 1 && matches!(values[0], Expr::Try { .. }) {
            match values.pop() {
                Some(Expr::Try { expr, span: try_span }) => {
                    self.destructure_try(*expr, try_span, names.len(), pre)
                }
                _ => values,
            }
        } else {
            if !values.is_empty() {
                self.check_capture(&values, names.len());
            }
            self.lower_ordered(values, pre)
        };
        Statement::Var(VarStmt {
            names,
            ty,
            values,
            span,
        })
    }

    /// `a, b := try f()`: one hoisted capture, then a plain assignment.
    fn destructure_try(
        &mut self,
        call: Expr,
        span: Span,
        expected: usize,
        pre: &mut Vec<Statement>,
    ) -> Vec<Expr> {
        let Some(values) = self.lower_try(call, span, false, pre) else {
            return Vec::new();
        };
        if values.len() != expected {
            self.errors.push(LowerError::arity(
                span,
                format!(
                    "`try` produces {} value(s) but {} are assigned",
                    values.len(),
                    expected
                ),
            ));
        }
        values
    }

    /// A single Result call must be captured in full: every value slot plus
    /// the error.
    fn check_capture(&mut self, values: &[Expr], targets: usize) {
        if let [value] = values {
            if let Some(sig) = self.result_callee(value) {
                if targets < sig.slot_count() {
                    self.errors
                        .push(LowerError::discarded_result(value.span(), &sig.name));
                }
            }
        }
    }

    fn result_return(&mut self, mut values: Vec<Expr>, span: Span, pre: &mut Vec<Statement>) -> Vec<Expr> {
        let expected = self.frame.value_count;
        if values.len() == 1 {
            if matches!(values[0], Expr::Try { .. }) {
                if let Some(Expr::Try { expr, span: try_span }) = values.pop() {
                    let mut values = self.destructure_try(*expr, try_span, expected, pre);
                    values.push(Expr::nil());
                    return values;
                }
            }
            let forwards = self
                .result_callee(&values[0])
                .is_some_and(|sig| sig.value_slots.len() == expected);
            if forwards {
                return self.lower_ordered(values, pre);
            }
        }
        if values.len() == expected {
            let mut values = self.lower_ordered(values, pre);
            values.push(Expr::nil());
            values
        } else if values.len() == expected + 1 {
            self.lower_ordered(values, pre)
        } else {
            self.errors.push(LowerError::arity(
                span,
                format!(
                    "`{}` returns {} value(s) plus an error, but this return has {}",
                    self.frame.function,
                    expected,
                    values.len()
                ),
            ));
            values
        }
    }

    fn rewrite_if(&mut self, if_stmt: IfStmt, pre: &mut Vec<Statement>) -> IfStmt {
        let condition = self.lower_expr(if_stmt.condition, pre);
        let then_branch = self.rewrite_block(if_stmt.then_branch);
        let else_branch = if_stmt.else_branch.map(|branch| match branch {
            ElseBranch::Block(block) => ElseBranch::Block(self.rewrite_block(block)),
            ElseBranch::ElseIf(nested) => {
                let mut inner = Vec::new();
                let nested = self.rewrite_if(*nested, &mut inner);
                if inner.is_empty() {
                    ElseBranch::ElseIf(Box::new(nested))
                } else {
                    // The hoisted capture must only run when this branch is reached.
                    inner.push(Statement::If(nested));
                    ElseBranch::Block(Block::new(inner))
                }
            }
        });
        IfStmt {
            condition,
            then_branch,
            else_branch,
            span: if_stmt.span,
        }
    }

    fn rewrite_for(&mut self, for_stmt: ForStmt, out: &mut Vec<Statement>) {
        let ForStmt { clause, body, span } = for_stmt;
        let mut pre = Vec::new();
        let mut scoped = false;
        let clause = match clause {
            ForClause::Infinite => ForClause::Infinite,
            ForClause::Condition(condition) => ForClause::Condition(self.loop_header(condition)),
            ForClause::ThreeClause {
                init,
                condition,
                post,
            } => {
                let init = init.and_then(|init| {
                    let mut lowered = Vec::new();
                    self.rewrite_statement(*init, &mut lowered);
                    let init = lowered.pop();
                    if !lowered.is_empty() {
                        scoped = true;
                        pre.extend(lowered);
                    }
                    init.map(Box::new)
                });
                let condition = condition.map(|condition| self.loop_header(condition));
                let post = post.and_then(|post| {
                    if walk::statement_contains_try(&post) {
                        self.errors.push(LowerError::unsupported(
                            post.span(),
                            "`try` in a loop post statement",
                        ));
                        return Some(post);
                    }
                    let mut lowered = Vec::new();
                    self.rewrite_statement(*post, &mut lowered);
                    lowered.pop().map(Box::new)
                });
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
            } => ForClause::Range {
                key,
                value,
                define,
                iterable: self.lower_expr(iterable, &mut pre),
            },
        };
        let body = self.rewrite_block(body);
        let lowered = Statement::For(ForStmt { clause, body, span });
        if scoped {
            // Keeps init-statement names scoped to the loop.
            pre.push(lowered);
            out.push(Statement::Block(Block::new(pre)));
        } else {
            out.extend(pre);
            out.push(lowered);
        }
    }

    /// Loop conditions re-evaluate every iteration, so there is nowhere to
    /// hoist a `try` to.
    fn loop_header(&mut self, condition: Expr) -> Expr {
        if walk::contains_try(&condition) {
            self.errors.push(
                LowerError::unsupported(condition.span(), "`try` in a loop condition")
                    .with_help("assign the value before the loop and update it in the body"),
            );
            return condition;
        }
        let mut pre = Vec::new();
        self.lower_expr(condition, &mut pre)
    }

    fn lower_dispatched(&mut self, call: Expr, keyword: &str, pre: &mut Vec<Statement>) -> Expr {
        if let Expr::Try { span, .. } = &call {
            self.errors.push(LowerError::unsupported(
                *span,
                format!("`{keyword}` applied to a `try` expression"),
            ));
            return call;
        }
        self.lower_expr(call, pre)
    }

    fn lower_expr(&mut self, expr: Expr, pre: &mut Vec<Statement>) -> Expr {
        match expr {
            Expr::Try { expr, span } => match self.lower_try(*expr, span, false, pre) {
                Some(mut values) if values.len() == 1 => values.remove(0),
                Some(values) => {
                    self.errors.push(
                        LowerError::arity(
                            span,
                            format!(
                                "`try` produces {} values where a single value is expected",
                                values.len()
                            ),
                        )
                        .with_help("assign the values to names first"),
                    );
                    Expr::nil()
                }
                None => Expr::nil(),
            },
            Expr::Binary {
                op,
                left,
                right,
                ..
            } if op.is_short_circuit() && walk::contains_try(&right) => {
                self.lower_short_circuit(op, *left, *right, pre)
            }
            Expr::Binary {
                op,
                left,
                right,
                span,
            } => {
                let mut operands = self.lower_ordered(vec![*left, *right], pre).into_iter();
                let left = operands.next().unwrap_or_else(Expr::nil);
                let right = operands.next().unwrap_or_else(Expr::nil);
                Expr::Binary {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                    span,
                }
            }
            Expr::Call { callee, args, span } => {
                let mut parts = Vec::with_capacity(args.len() + 1);
                parts.push(*callee);
                parts.extend(args);
                let mut parts = self.lower_ordered(parts, pre).into_iter();
                let callee = parts.next().unwrap_or_else(Expr::nil);
                Expr::Call {
                    callee: Box::new(callee),
                    args: parts.collect(),
                    span,
                }
            }
            Expr::Unary { op, expr, span } => Expr::Unary {
                op,
                expr: Box::new(self.lower_expr(*expr, pre)),
                span,
            },
            Expr::Selector { base, field, span } => Expr::Selector {
                base: Box::new(self.lower_expr(*base, pre)),
                field,
                span,
            },
            Expr::Index { base, index, span } => {
                let mut operands = self.lower_ordered(vec![*base, *index], pre).into_iter();
                let base = operands.next().unwrap_or_else(Expr::nil);
                let index = operands.next().unwrap_or_else(Expr::nil);
                Expr::Index {
                    base: Box::new(base),
                    index: Box::new(index),
                    span,
                }
            }
            Expr::Composite { ty, elements, span } => {
                let keyed: Vec<bool> = elements.iter().map(|e| e.key.is_some()).collect();
                let flat = elements
                    .into_iter()
                    .flat_map(|element| element.key.into_iter().chain([element.value]))
                    .collect();
                let mut flat = self.lower_ordered(flat, pre).into_iter();
                let elements = keyed
                    .into_iter()
                    .map(|has_key| {
                        let key = if has_key { flat.next() } else { None };
                        CompositeElement {
                            key,
                            value: flat.next().unwrap_or_else(Expr::nil),
                        }
                    })
                    .collect();
                Expr::Composite { ty, elements, span }
            }
            Expr::Interpolated(lit) => {
                let mut embedded = Vec::new();
                let mut shape = Vec::new();
                for segment in lit.segments {
                    match segment {
                        InterpolationSegment::Expr { expr, verb, span } => {
                            embedded.push(expr);
                            shape.push(Some((verb, span)));
                        }
                        InterpolationSegment::Text(text) => {
                            shape.push(None);
                            embedded.push(Expr::string(text));
                        }
                    }
                }
                let lowered = self.lower_ordered(embedded, pre);
                let segments = lowered
                    .into_iter()
                    .zip(shape)
                    .map(|(expr, shape)| match (shape, expr) {
                        (Some((verb, span)), expr) => InterpolationSegment::Expr { expr, verb, span },
                        (None, Expr::Literal(Literal::String(text, _))) => {
                            InterpolationSegment::Text(text)
                        }
                        (None, _) => InterpolationSegment::Text(String::new()),
                    })
                    .collect();
                Expr::Interpolated(InterpolatedString {
                    segments,
                    span: lit.span,
                })
            }
            Expr::FuncLit(lit) => self.rewrite_func_lit(*lit),
            leaf @ (Expr::Identifier(_) | Expr::Literal(_) | Expr::Type(..)) => leaf,
        }
    }

    /// Lowers sibling operands left to right. Impure operands evaluated before
    /// the last hoisted `try` are spilled so they still run first.
    fn lower_ordered(&mut self, exprs: Vec<Expr>, pre: &mut Vec<Statement>) -> Vec<Expr> {
        let last_try = exprs.iter().rposition(walk::contains_try);
        let mut lowered = Vec::with_capacity(exprs.len());
        for (position, expr) in exprs.into_iter().enumerate() {
            let expr = self.lower_expr(expr, pre);
            if last_try.is_some_and(|last| position < last) {
                lowered.push(self.spill(expr, pre));
            } else {
                lowered.push(expr);
            }
        }
        lowered
    }

    /// Assignment targets keep their shape; only their operands are lowered.
    fn lower_target(&mut self, target: Expr, spill: bool, pre: &mut Vec<Statement>) -> Expr {
        match target {
            Expr::Index { base, index, span } => {
                let mut operands = self.lower_ordered(vec![*base, *index], pre).into_iter();
                let mut base = operands.next().unwrap_or_else(Expr::nil);
                let mut index = operands.next().unwrap_or_else(Expr::nil);
                if spill {
                    base = self.spill(base, pre);
                    index = self.spill(index, pre);
                }
                Expr::Index {
                    base: Box::new(base),
                    index: Box::new(index),
                    span,
                }
            }
            Expr::Selector { base, field, span } => {
                let mut base = self.lower_expr(*base, pre);
                if spill {
                    base = self.spill(base, pre);
                }
                Expr::Selector {
                    base: Box::new(base),
                    field,
                    span,
                }
            }
            Expr::Unary {
                op: UnaryOp::Deref,
                expr,
                span,
            } => {
                let mut pointer = self.lower_expr(*expr, pre);
                if spill {
                    pointer = self.spill(pointer, pre);
                }
                Expr::Unary {
                    op: UnaryOp::Deref,
                    expr: Box::new(pointer),
                    span,
                }
            }
            other => self.lower_expr(other, pre),
        }
    }

    fn spill(&mut self, expr: Expr, pre: &mut Vec<Statement>) -> Expr {
        if is_pure(&expr) {
            return expr;
        }
        let name = self.names.fresh("Tmp");
        trace!("spilled operand into `{name}` ahead of a hoisted `try`");
        pre.push(Statement::define(&[name.as_str()], vec![expr]));
        Expr::ident(name)
    }

    /// `a && try f()` evaluates `f` only when `a` holds.
    fn lower_short_circuit(
        &mut self,
        op: BinaryOp,
        left: Expr,
        right: Expr,
        pre: &mut Vec<Statement>,
    ) -> Expr {
        let left = self.lower_expr(left, pre);
        let cond = self.names.fresh("Cond");
        pre.push(Statement::define(&[cond.as_str()], vec![left]));

        let mut guarded = Vec::new();
        let right = self.lower_expr(right, &mut guarded);
        guarded.push(Statement::assign(vec![Expr::ident(&cond)], vec![right]));
        let guard = if op == BinaryOp::Or {
            Expr::unary(UnaryOp::Not, Expr::ident(&cond))
        } else {
            Expr::ident(&cond)
        };
        trace!("guarded `try` behind `{cond}`");
        pre.push(Statement::if_then(guard, guarded));
        Expr::ident(cond)
    }

    /// Hoists `try call` into `pre` and returns references to the captured
    /// values. With `discard`, values are captured into `_` and none are
    /// returned.
    fn lower_try(
        &mut self,
        call: Expr,
        span: Span,
        discard: bool,
        pre: &mut Vec<Statement>,
    ) -> Option<Vec<Expr>> {
        if !self.frame.is_result {
            self.errors.push(
                LowerError::new(
                    LowerErrorKind::ThrowWithoutResultType,
                    span,
                    format!(
                        "`try` in `{}`, whose return type is not a Result",
                        self.frame.function
                    ),
                )
                .with_help("only a Result-returning function can propagate an error"),
            );
            return None;
        }
        let Expr::Call { callee, .. } = &call else {
            self.errors.push(LowerError::invalid_type_usage(
                span,
                "`try` must be applied to a function call",
            ));
            return None;
        };
        let sig: FnSignature = match self.table.resolve_call(callee, &self.env) {
            Some(sig) if sig.is_result => sig.clone(),
            Some(sig) => {
                self.errors.push(LowerError::invalid_type_usage(
                    span,
                    format!("`try` applied to `{}`, which does not return a Result", sig.name),
                ));
                return None;
            }
            None => {
                self.errors.push(
                    LowerError::invalid_type_usage(
                        span,
                        "`try` applied to a call whose Result signature is unknown",
                    )
                    .with_help("`try` needs a Result function declared in this program unit"),
                );
                return None;
            }
        };

        let call = self.lower_expr(call, pre);
        let values: Vec<String> = sig
            .value_slots
            .iter()
            .map(|_| {
                if discard {
                    "_".to_string()
                } else {
                    self.names.fresh("Val")
                }
            })
            .collect();
        let error = self.names.fresh("Err");
        let mut targets: Vec<&str> = values.iter().map(String::as_str).collect();
        targets.push(&error);
        pre.push(Statement::define(&targets, vec![call]));
        pre.push(Statement::if_then(
            Expr::binary(BinaryOp::NotEq, Expr::ident(&error), Expr::nil()),
            vec![self.early_return(Expr::ident(&error), span)],
        ));
        trace!("hoisted `try {}` into `{}`", sig.name, error);

        Some(
            values
                .into_iter()
                .filter(|name| name != "_")
                .map(Expr::ident)
                .collect(),
        )
    }

    fn early_return(&self, error: Expr, span: Span) -> Statement {
        let mut values = self.frame.zeros.clone();
        values.push(error);
        Statement::Return(ReturnStmt { values, span })
    }

    /// The error value a `throw` operand stands for.
    fn error_value(&mut self, value: Expr) -> Expr {
        match value {
            Expr::Literal(Literal::String(..)) => {
                self.imports.require_for(&self.options.error_constructor);
                Expr::call_path(&self.options.error_constructor, vec![value])
            }
            Expr::Interpolated(lit) => {
                match interpolate::expand(lit, &self.options.error_format_function) {
                    Ok(call) => {
                        self.imports.require_for(&self.options.error_format_function);
                        call
                    }
                    Err(err) => {
                        self.errors.push(err);
                        Expr::nil()
                    }
                }
            }
            other => other,
        }
    }

    /// A Result call whose values nobody receives loses its error.
    fn check_discarded(&mut self, expr: &Expr) {
        if let Some(sig) = self.result_callee(expr) {
            self.errors
                .push(LowerError::discarded_result(expr.span(), &sig.name));
        }
    }

    fn result_callee(&self, expr: &Expr) -> Option<FnSignature> {
        match expr {
            Expr::Call { callee, .. } => self
                .table
                .resolve_call(callee, &self.env)
                .filter(|sig| sig.is_result)
                .cloned(),
            _ => None,
        }
    }

    fn rewrite_func_lit(&mut self, lit: FuncLit) -> Expr {
        let FuncLit {
            params,
            returns,
            body,
            span,
        } = lit;
        let shape = match lower_return(returns.as_ref(), span, self.options) {
            Ok(shape) => shape,
            Err(err) => {
                self.errors.push(err);
                ReturnShape::default()
            }
        };
        let frame = Frame::new(
            &format!("{} (function literal)", self.frame.function),
            &shape.value_slots,
            shape.is_result,
            self.table,
        );
        let outer = mem::replace(&mut self.frame, frame);
        let body = self.rewrite_block(body);
        self.frame = outer;
        Expr::FuncLit(Box::new(FuncLit {
            params,
            returns: shape.lowered_return(),
            body,
            span,
        }))
    }
}
