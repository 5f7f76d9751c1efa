//! Generic traversal over statements and expressions.
//!
//! `visit_*` walks by reference in evaluation order; the callback returns
//! `false` to skip a node's children. `map_*` rebuilds the tree bottom-up so
//! a rewrite sees its operands already rewritten (innermost first).

use crate::language::ast::*;

pub fn visit_expr(expr: &Expr, f: &mut impl FnMut(&Expr) -> bool) {
    if !f(expr) {
        return;
    }
    match expr {
        Expr::Identifier(_) | Expr::Literal(_) | Expr::Type(..) => {}
        Expr::Call { callee, args, .. } => {
            visit_expr(callee, f);
            for arg in args {
                visit_expr(arg, f);
            }
        }
        Expr::Interpolated(lit) => {
            for segment in &lit.segments {
                if let InterpolationSegment::Expr { expr, .. } = segment {
                    visit_expr(expr, f);
                }
            }
        }
        Expr::Try { expr, .. } | Expr::Unary { expr, .. } => visit_expr(expr, f),
        Expr::Binary { left, right, .. } => {
            visit_expr(left, f);
            visit_expr(right, f);
        }
        Expr::Selector { base, .. } => visit_expr(base, f),
        Expr::Index { base, index, .. } => {
            visit_expr(base, f);
            visit_expr(index, f);
        }
        Expr::Composite { elements, .. } => {
            for element in elements {
                if let Some(key) = &element.key {
                    visit_expr(key, f);
                }
                visit_expr(&element.value, f);
            }
        }
        Expr::FuncLit(lit) => visit_block(&lit.body, f),
    }
}

pub fn visit_block(block: &Block, f: &mut impl FnMut(&Expr) -> bool) {
    for stmt in &block.statements {
        visit_statement(stmt, f);
    }
}

pub fn visit_statement(stmt: &Statement, f: &mut impl FnMut(&Expr) -> bool) {
    match stmt {
        Statement::Var(var) => {
            for value in &var.values {
                visit_expr(value, f);
            }
        }
        Statement::Assign(assign) => {
            for target in &assign.targets {
                visit_expr(target, f);
            }
            for value in &assign.values {
                visit_expr(value, f);
            }
        }
        Statement::Expr(stmt) => visit_expr(&stmt.expr, f),
        Statement::Return(ret) => {
            for value in &ret.values {
                visit_expr(value, f);
            }
        }
        Statement::If(if_stmt) => visit_if(if_stmt, f),
        Statement::For(for_stmt) => {
            match &for_stmt.clause {
                ForClause::Infinite => {}
                ForClause::Condition(cond) => visit_expr(cond, f),
                ForClause::ThreeClause {
                    init,
                    condition,
                    post,
                } => {
                    if let Some(init) = init {
                        visit_statement(init, f);
                    }
                    if let Some(cond) = condition {
                        visit_expr(cond, f);
                    }
                    if let Some(post) = post {
                        visit_statement(post, f);
                    }
                }
                ForClause::Range { iterable, .. } => visit_expr(iterable, f),
            }
            visit_block(&for_stmt.body, f);
        }
        Statement::Throw(throw) => visit_expr(&throw.value, f),
        Statement::GoBinding(binding) => visit_expr(&binding.call, f),
        Statement::Go(stmt) => visit_expr(&stmt.call, f),
        Statement::Defer(stmt) => visit_expr(&stmt.call, f),
        Statement::Break(_) | Statement::Continue(_) => {}
        Statement::Block(block) => visit_block(block, f),
    }
}

fn visit_if(if_stmt: &IfStmt, f: &mut impl FnMut(&Expr) -> bool) {
    visit_expr(&if_stmt.condition, f);
    visit_block(&if_stmt.then_branch, f);
    match &if_stmt.else_branch {
        Some(ElseBranch::Block(block)) => visit_block(block, f),
        Some(ElseBranch::ElseIf(nested)) => visit_if(nested, f),
        None => {}
    }
}

/// True when `expr` contains a `try` outside any nested function literal.
pub fn contains_try(expr: &Expr) -> bool {
    let mut found = false;
    visit_expr(expr, &mut |node| {
        if found {
            return false;
        }
        match node {
            Expr::Try { .. } => {
                found = true;
                false
            }
            Expr::FuncLit(_) => false,
            _ => true,
        }
    });
    found
}

pub fn statement_contains_try(stmt: &Statement) -> bool {
    let mut found = false;
    visit_statement(stmt, &mut |node| {
        if found {
            return false;
        }
        match node {
            Expr::Try { .. } => {
                found = true;
                false
            }
            Expr::FuncLit(_) => false,
            _ => true,
        }
    });
    found
}

/// Every identifier and declared name in a function, used to keep hidden
/// names fresh.
pub fn collect_names(def: &FunctionDecl) -> Vec<String> {
    let mut names: Vec<String> = def.params.iter().map(|p| p.name.clone()).collect();
    if let Some(receiver) = &def.receiver {
        names.push(receiver.name.clone());
    }
    collect_block_names(&def.body, &mut names);
    names
}

fn collect_block_names(block: &Block, names: &mut Vec<String>) {
    for stmt in &block.statements {
        match stmt {
            Statement::Var(var) => names.extend(var.names.iter().map(|n| n.name.clone())),
            Statement::GoBinding(binding) => {
                names.extend(binding.names.iter().map(|n| n.name.clone()))
            }
            Statement::For(for_stmt) => {
                if let ForClause::Range { key, value, .. } = &for_stmt.clause {
                    names.extend(key.iter().chain(value.iter()).map(|n| n.name.clone()));
                }
                collect_block_names(&for_stmt.body, names);
            }
            Statement::Block(block) => collect_block_names(block, names),
            Statement::If(if_stmt) => collect_if_names(if_stmt, names),
            _ => {}
        }
    }
    visit_block(block, &mut |expr| {
        match expr {
            Expr::Identifier(ident) => names.push(ident.name.clone()),
            Expr::FuncLit(lit) => names.extend(lit.params.iter().map(|p| p.name.clone())),
            _ => {}
        }
        true
    });
}

fn collect_if_names(if_stmt: &IfStmt, names: &mut Vec<String>) {
    collect_block_names(&if_stmt.then_branch, names);
    match &if_stmt.else_branch {
        Some(ElseBranch::Block(block)) => collect_block_names(block, names),
        Some(ElseBranch::ElseIf(nested)) => collect_if_names(nested, names),
        None => {}
    }
}

pub fn map_expr(expr: Expr, f: &mut impl FnMut(Expr) -> Expr) -> Expr {
    map_expr_inner(expr, true, f)
}

/// Like [`map_expr`], but hands function literals to `f` untouched instead of
/// rewriting their bodies.
pub fn map_expr_shallow(expr: Expr, f: &mut impl FnMut(Expr) -> Expr) -> Expr {
    map_expr_inner(expr, false, f)
}

fn map_expr_inner(expr: Expr, deep: bool, f: &mut impl FnMut(Expr) -> Expr) -> Expr {
    let rebuilt = match expr {
        Expr::Identifier(_) | Expr::Literal(_) | Expr::Type(..) => expr,
        Expr::Call { callee, args, span } => Expr::Call {
            callee: Box::new(map_expr_inner(*callee, deep, f)),
            args: args.into_iter().map(|arg| map_expr_inner(arg, deep, f)).collect(),
            span,
        },
        Expr::Interpolated(lit) => Expr::Interpolated(InterpolatedString {
            segments: lit
                .segments
                .into_iter()
                .map(|segment| match segment {
                    InterpolationSegment::Expr { expr, verb, span } => InterpolationSegment::Expr {
                        expr: map_expr_inner(expr, deep, f),
                        verb,
                        span,
                    },
                    text => text,
                })
                .collect(),
            span: lit.span,
        }),
        Expr::Try { expr, span } => Expr::Try {
            expr: Box::new(map_expr_inner(*expr, deep, f)),
            span,
        },
        Expr::Binary {
            op,
            left,
            right,
            span,
        } => Expr::Binary {
            op,
            left: Box::new(map_expr_inner(*left, deep, f)),
            right: Box::new(map_expr_inner(*right, deep, f)),
            span,
        },
        Expr::Unary { op, expr, span } => Expr::Unary {
            op,
            expr: Box::new(map_expr_inner(*expr, deep, f)),
            span,
        },
        Expr::Selector { base, field, span } => Expr::Selector {
            base: Box::new(map_expr_inner(*base, deep, f)),
            field,
            span,
        },
        Expr::Index { base, index, span } => Expr::Index {
            base: Box::new(map_expr_inner(*base, deep, f)),
            index: Box::new(map_expr_inner(*index, deep, f)),
            span,
        },
        Expr::Composite { ty, elements, span } => Expr::Composite {
            ty,
            elements: elements
                .into_iter()
                .map(|element| CompositeElement {
                    key: element.key.map(|key| map_expr_inner(key, deep, f)),
                    value: map_expr_inner(element.value, deep, f),
                })
                .collect(),
            span,
        },
        Expr::FuncLit(lit) if deep => {
            let lit = *lit;
            Expr::FuncLit(Box::new(FuncLit {
                body: map_block(lit.body, f),
                ..lit
            }))
        }
        Expr::FuncLit(lit) => Expr::FuncLit(lit),
    };
    f(rebuilt)
}

pub fn map_block(block: Block, f: &mut impl FnMut(Expr) -> Expr) -> Block {
    Block {
        statements: block
            .statements
            .into_iter()
            .map(|stmt| map_statement(stmt, f))
            .collect(),
        span: block.span,
    }
}

fn map_exprs(exprs: Vec<Expr>, f: &mut impl FnMut(Expr) -> Expr) -> Vec<Expr> {
    exprs.into_iter().map(|expr| map_expr(expr, f)).collect()
}

pub fn map_statement(stmt: Statement, f: &mut impl FnMut(Expr) -> Expr) -> Statement {
    match stmt {
        Statement::Var(var) => Statement::Var(VarStmt {
            values: map_exprs(var.values, f),
            ..var
        }),
        Statement::Assign(assign) => Statement::Assign(AssignStmt {
            targets: map_exprs(assign.targets, f),
            values: map_exprs(assign.values, f),
            ..assign
        }),
        Statement::Expr(stmt) => Statement::Expr(ExprStmt {
            expr: map_expr(stmt.expr, f),
        }),
        Statement::Return(ret) => Statement::Return(ReturnStmt {
            values: map_exprs(ret.values, f),
            span: ret.span,
        }),
        Statement::If(if_stmt) => Statement::If(map_if(if_stmt, f)),
        Statement::For(for_stmt) => {
            let clause = match for_stmt.clause {
                ForClause::Infinite => ForClause::Infinite,
                ForClause::Condition(cond) => ForClause::Condition(map_expr(cond, f)),
                ForClause::ThreeClause {
                    init,
                    condition,
                    post,
                } => ForClause::ThreeClause {
                    init: init.map(|init| Box::new(map_statement(*init, f))),
                    condition: condition.map(|cond| map_expr(cond, f)),
                    post: post.map(|post| Box::new(map_statement(*post, f))),
                },
                ForClause::Range {
                    key,
                    value,
                    define,
                    iterable,
                } => ForClause::Range {
                    key,
                    value,
                    define,
                    iterable: map_expr(iterable, f),
                },
            };
            Statement::For(ForStmt {
                clause,
                body: map_block(for_stmt.body, f),
                span: for_stmt.span,
            })
        }
        Statement::Throw(throw) => Statement::Throw(ThrowStmt {
            value: map_expr(throw.value, f),
            span: throw.span,
        }),
        Statement::GoBinding(binding) => Statement::GoBinding(GoBindingStmt {
            call: map_expr(binding.call, f),
            ..binding
        }),
        Statement::Go(stmt) => Statement::Go(GoStmt {
            call: map_expr(stmt.call, f),
            span: stmt.span,
        }),
        Statement::Defer(stmt) => Statement::Defer(DeferStmt {
            call: map_expr(stmt.call, f),
            span: stmt.span,
        }),
        Statement::Break(span) => Statement::Break(span),
        Statement::Continue(span) => Statement::Continue(span),
        Statement::Block(block) => Statement::Block(map_block(block, f)),
    }
}

fn map_if(if_stmt: IfStmt, f: &mut impl FnMut(Expr) -> Expr) -> IfStmt {
    IfStmt {
        condition: map_expr(if_stmt.condition, f),
        then_branch: map_block(if_stmt.then_branch, f),
        else_branch: if_stmt.else_branch.map(|branch| match branch {
            ElseBranch::Block(block) => ElseBranch::Block(map_block(block, f)),
            ElseBranch::ElseIf(nested) => ElseBranch::ElseIf(Box::new(map_if(*nested, f))),
        }),
        span: if_stmt.span,
    }
}
