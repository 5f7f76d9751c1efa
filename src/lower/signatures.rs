use crate::language::{
    ast::*,
    types::TypeExpr,
};
use crate::lower::walk;
use std::collections::{HashMap, HashSet};

/// A function or method signature as the passes see it: declared types for
/// checks, lowered slots for rewriting.
#[derive(Clone, Debug, PartialEq)]
pub struct FnSignature {
    pub name: String,
    /// Declared parameter types, before lowering.
    pub params: Vec<TypeExpr>,
    /// Declared return slots with any Result wrapper removed, before lowering.
    pub declared_slots: Vec<TypeExpr>,
    /// Lowered value slots, excluding the error slot.
    pub value_slots: Vec<TypeExpr>,
    pub is_result: bool,
}

impl FnSignature {
    /// Every positional return value after lowering, error slot included.
    pub fn lowered_slots(&self) -> Vec<TypeExpr> {
        let mut slots = self.value_slots.clone();
        if self.is_result {
            slots.push(TypeExpr::error());
        }
        slots
    }

    pub fn slot_count(&self) -> usize {
        self.value_slots.len() + usize::from(self.is_result)
    }

    /// The lowered return clause of the declaration.
    pub fn lowered_return(&self) -> Option<TypeExpr> {
        let mut slots = self.lowered_slots();
        match slots.len() {
            0 => None,
            1 => slots.pop(),
            _ => Some(TypeExpr::Tuple(slots)),
        }
    }
}

#[derive(Debug, Default)]
pub struct SignatureTable {
    functions: HashMap<String, FnSignature>,
    structs: HashSet<String>,
}

impl SignatureTable {
    pub fn insert(&mut self, key: String, signature: FnSignature) {
        self.functions.insert(key, signature);
    }

    pub fn insert_struct(&mut self, name: impl Into<String>) {
        self.structs.insert(name.into());
    }

    pub fn get(&self, key: &str) -> Option<&FnSignature> {
        self.functions.get(key)
    }

    pub fn is_struct(&self, name: &str) -> bool {
        self.structs.contains(name)
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// Resolves the callee of a call to a declaration in this program unit.
    ///
    /// Plain identifiers resolve to free functions unless a local shadows them;
    /// `recv.Method` resolves when `recv` has a declared or obvious type.
    pub fn resolve_call(&self, callee: &Expr, env: &TypeEnv) -> Option<&FnSignature> {
        match callee {
            Expr::Identifier(ident) if env.get(&ident.name).is_none() => self.get(&ident.name),
            Expr::Selector { base, field, .. } => {
                let receiver = base.as_identifier()?;
                let ty = env.get(receiver)?;
                self.get(&method_key(receiver_type_name(ty), field))
            }
            _ => None,
        }
    }
}

/// Flat map from local names to declared types within one function.
///
/// Shadowing is not tracked; the last declaration of a name wins.
#[derive(Clone, Debug, Default)]
pub struct TypeEnv {
    vars: HashMap<String, TypeExpr>,
}

impl TypeEnv {
    pub fn for_function(def: &FunctionDecl, table: &SignatureTable) -> Self {
        let mut env = TypeEnv::default();
        if let Some(receiver) = &def.receiver {
            env.declare(&receiver.name, receiver.ty.clone());
        }
        env.declare_params(&def.params);
        env.scan_block(&def.body, table);
        env
    }

    pub fn declare(&mut self, name: &str, ty: TypeExpr) {
        if name != "_" {
            self.vars.insert(name.to_string(), ty);
        }
    }

    pub fn get(&self, name: &str) -> Option<&TypeExpr> {
        self.vars.get(name)
    }

    fn declare_params(&mut self, params: &[Param]) {
        for param in params {
            self.declare(&param.name, param.ty.clone());
        }
    }

    fn scan_block(&mut self, block: &Block, table: &SignatureTable) {
        for stmt in &block.statements {
            self.scan_statement(stmt, table);
        }
        walk::visit_block(block, &mut |expr| {
            if let Expr::FuncLit(lit) = expr {
                self.declare_params(&lit.params);
            }
            true
        });
    }

    fn scan_statement(&mut self, stmt: &Statement, table: &SignatureTable) {
        match stmt {
            Statement::Var(var) => {
                if let Some(ty) = &var.ty {
                    for name in &var.names {
                        self.declare(&name.name, ty.clone());
                    }
                }
            }
            Statement::Assign(assign) if assign.op == AssignOp::Define => {
                if assign.targets.len() == 1 && assign.values.len() == 1 {
                    if let (Some(name), Some(ty)) = (
                        assign.targets[0].as_identifier(),
                        obvious_type(&assign.values[0], table, self),
                    ) {
                        self.declare(name, ty);
                    }
                }
            }
            Statement::If(if_stmt) => self.scan_if(if_stmt, table),
            Statement::For(for_stmt) => {
                if let ForClause::ThreeClause {
                    init: Some(init), ..
                } = &for_stmt.clause
                {
                    self.scan_statement(init, table);
                }
                self.scan_block(&for_stmt.body, table);
            }
            Statement::Block(block) => self.scan_block(block, table),
            _ => {}
        }
    }

    fn scan_if(&mut self, if_stmt: &IfStmt, table: &SignatureTable) {
        self.scan_block(&if_stmt.then_branch, table);
        match &if_stmt.else_branch {
            Some(ElseBranch::Block(block)) => self.scan_block(block, table),
            Some(ElseBranch::ElseIf(nested)) => self.scan_if(nested, table),
            None => {}
        }
    }
}

/// Type of an initializer when it can be read off syntactically.
fn obvious_type(value: &Expr, table: &SignatureTable, env: &TypeEnv) -> Option<TypeExpr> {
    match value {
        Expr::Composite { ty, .. } => Some(ty.clone()),
        Expr::Unary {
            op: UnaryOp::AddressOf,
            expr,
            ..
        } => match expr.as_ref() {
            Expr::Composite { ty, .. } => Some(TypeExpr::pointer(ty.clone())),
            _ => None,
        },
        Expr::Call { callee, .. } => {
            let sig = table.resolve_call(callee, env)?;
            match (sig.is_result, sig.value_slots.as_slice()) {
                (false, [single]) => Some(single.clone()),
                _ => None,
            }
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signature(name: &str, is_result: bool, values: Vec<TypeExpr>) -> FnSignature {
        FnSignature {
            name: name.into(),
            params: Vec::new(),
            declared_slots: values.clone(),
            value_slots: values,
            is_result,
        }
    }

    #[test]
    fn result_signature_gains_error_slot() {
        let sig = signature("Hello", true, vec![TypeExpr::named("string")]);
        assert_eq!(sig.slot_count(), 2);
        assert_eq!(
            sig.lowered_return(),
            Some(TypeExpr::Tuple(vec![
                TypeExpr::named("string"),
                TypeExpr::error()
            ]))
        );
        let unit = signature("Save", true, Vec::new());
        assert_eq!(unit.lowered_return(), Some(TypeExpr::error()));
    }

    #[test]
    fn methods_resolve_through_declared_receiver_types() {
        let mut table = SignatureTable::default();
        table.insert(
            "Store.Load".into(),
            signature("Load", true, vec![TypeExpr::named("int")]),
        );
        let def = FunctionDecl::new(
            "run",
            vec![Param::new("store", TypeExpr::pointer(TypeExpr::named("Store")))],
            None,
        );
        let env = TypeEnv::for_function(&def, &table);
        let callee = Expr::selector(Expr::ident("store"), "Load");
        assert_eq!(
            table.resolve_call(&callee, &env).map(|sig| sig.name.as_str()),
            Some("Load")
        );
        let unknown = Expr::selector(Expr::ident("other"), "Load");
        assert!(table.resolve_call(&unknown, &env).is_none());
    }

    #[test]
    fn locals_shadow_free_functions() {
        let mut table = SignatureTable::default();
        table.insert("fetch".into(), signature("fetch", true, Vec::new()));
        let def = FunctionDecl::new(
            "run",
            vec![Param::new("fetch", TypeExpr::named("Fetcher"))],
            None,
        );
        let env = TypeEnv::for_function(&def, &table);
        assert!(table.resolve_call(&Expr::ident("fetch"), &env).is_none());
    }

    #[test]
    fn constructor_calls_give_locals_a_type() {
        let mut table = SignatureTable::default();
        table.insert(
            "NewStore".into(),
            signature("NewStore", false, vec![TypeExpr::pointer(TypeExpr::named("Store"))]),
        );
        let def = FunctionDecl::new("run", Vec::new(), None).with_body(vec![Statement::define(
            &["store"],
            vec![Expr::call(Expr::ident("NewStore"), Vec::new())],
        )]);
        let env = TypeEnv::for_function(&def, &table);
        assert_eq!(
            env.get("store"),
            Some(&TypeExpr::pointer(TypeExpr::named("Store")))
        );
    }
}
