//! Semantic analyzer: one pass over the AST that populates a symbol
//! table, enforces the type rules, and rejects every undeclared or
//! ill-typed use. Fatal on the first violation.

use crate::ast::*;
use crate::error::CompileError;
use crate::symbol::{Symbol, SymbolKind, SymbolTable};
use crate::types::Type;

pub struct Analyzer {
    table: SymbolTable,
}

impl Analyzer {
    pub fn new() -> Self {
        Analyzer { table: SymbolTable::new() }
    }

    /// Check `program`, returning the populated symbol table (consumed
    /// by code generation for name/type resolution).
    pub fn analyze(mut self, program: &Program) -> Result<SymbolTable, CompileError> {
        self.visit_block(&program.block)?;
        Ok(self.table)
    }

    fn declare(&mut self, symbol: Symbol) -> Result<(), CompileError> {
        self.table
            .declare(symbol)
            .map_err(|name| CompileError::semantic(format!("'{}' is already declared in this scope", name)))
    }

    fn undeclared(name: &str) -> CompileError {
        CompileError::semantic(format!("Undeclared identifier '{}'", name))
    }

    fn visit_block(&mut self, block: &Block) -> Result<(), CompileError> {
        for decl in &block.declarations {
            if let Decl::VarDecl { name, typ } = decl {
                self.declare(Symbol::new(name.clone(), typ.clone(), SymbolKind::Var))?;
            }
        }

        // Pre-declare every subprogram's signature in this scope so that
        // recursive and mutually-recursive calls resolve.
        for sub in &block.subprograms {
            self.declare(Self::subprogram_signature(sub))?;
        }

        for sub in &block.subprograms {
            self.visit_subprogram(sub)?;
        }

        for stmt in &block.statements {
            self.visit_statement(stmt)?;
        }

        Ok(())
    }

    fn subprogram_signature(decl: &Decl) -> Symbol {
        match decl {
            Decl::ProcedureDecl { name, params, .. } => Symbol::callable(
                name.clone(),
                Type::Boolean,
                SymbolKind::Proc,
                params.iter().map(|p| p.typ.clone()).collect(),
            ),
            Decl::FunctionDecl { name, params, return_type, .. } => Symbol::callable(
                name.clone(),
                return_type.clone(),
                SymbolKind::Func,
                params.iter().map(|p| p.typ.clone()).collect(),
            ),
            _ => unreachable!("block.subprograms only ever holds Procedure/FunctionDecl"),
        }
    }

    fn visit_subprogram(&mut self, decl: &Decl) -> Result<(), CompileError> {
        match decl {
            Decl::ProcedureDecl { params, block, .. } => {
                self.table.push_scope();
                for p in params {
                    self.declare(Symbol::new(p.name.clone(), p.typ.clone(), SymbolKind::Param))?;
                }
                let result = self.visit_block(block);
                self.table.pop_scope();
                result
            }
            Decl::FunctionDecl { name, params, return_type, block } => {
                self.table.push_scope();
                for p in params {
                    self.declare(Symbol::new(p.name.clone(), p.typ.clone(), SymbolKind::Param))?;
                }
                // Re-declared here (shadowing the outer pre-declared signature)
                // so both `name := expr` and a recursive `name(...)` call
                // resolve inside the function's own body; kept as `Func`
                // rather than `Var` so the recursive-call path still matches.
                let declared = self.declare(Symbol::callable(
                    name.clone(),
                    return_type.clone(),
                    SymbolKind::Func,
                    params.iter().map(|p| p.typ.clone()).collect(),
                ));
                let result = declared.and_then(|_| self.visit_block(block));
                self.table.pop_scope();
                result
            }
            _ => unreachable!(),
        }
    }

    fn visit_statement(&mut self, stmt: &Statement) -> Result<(), CompileError> {
        match stmt {
            Statement::Assign { target, expr } => {
                let rhs = self.expr_type(expr)?;
                let lhs = self.lvalue_type(target)?;
                self.check_assignable(&lhs, &rhs)
            }
            Statement::If { cond, then_branch, else_branch } => {
                self.require_boolean(cond)?;
                self.visit_statement(then_branch)?;
                if let Some(b) = else_branch {
                    self.visit_statement(b)?;
                }
                Ok(())
            }
            Statement::While { cond, body } => {
                self.require_boolean(cond)?;
                self.visit_statement(body)
            }
            Statement::Repeat { body, cond } => {
                for s in body {
                    self.visit_statement(s)?;
                }
                self.require_boolean(cond)
            }
            Statement::For { var, start, end, body, .. } => {
                let loop_var = self.table.lookup(var).ok_or_else(|| Self::undeclared(var))?;
                if loop_var.typ != Type::Integer {
                    return Err(CompileError::semantic(format!(
                        "for-loop variable '{}' must be integer",
                        var
                    )));
                }
                let start_type = self.expr_type(start)?;
                if start_type != Type::Integer {
                    return Err(CompileError::semantic(format!(
                        "for-loop start bound must be integer, found {}",
                        start_type
                    )));
                }
                let end_type = self.expr_type(end)?;
                if end_type != Type::Integer {
                    return Err(CompileError::semantic(format!(
                        "for-loop end bound must be integer, found {}",
                        end_type
                    )));
                }
                self.visit_statement(body)
            }
            Statement::ProcCall { name, args } => self.visit_proc_call(name, args),
            Statement::Compound(stmts) => {
                for s in stmts {
                    self.visit_statement(s)?;
                }
                Ok(())
            }
            Statement::NoOp => Ok(()),
        }
    }

    fn visit_proc_call(&mut self, name: &str, args: &[Expr]) -> Result<(), CompileError> {
        match name.to_lowercase().as_str() {
            "writeln" => {
                for a in args {
                    self.expr_type(a)?;
                }
                Ok(())
            }
            "readln" => {
                for a in args {
                    match a {
                        Expr::Var(_) | Expr::ArrayAccess { .. } => {
                            self.expr_type(a)?;
                        }
                        _ => {
                            return Err(CompileError::semantic(
                                "readln argument must be a variable or array element",
                            ))
                        }
                    }
                }
                Ok(())
            }
            _ => match self.table.lookup(name).cloned() {
                Some(sym) if sym.kind == SymbolKind::Proc => {
                    let arg_types = args.iter().map(|a| self.expr_type(a)).collect::<Result<Vec<_>, _>>()?;
                    self.check_call_args(name, &sym.params, &arg_types)
                }
                Some(_) => Err(CompileError::semantic(format!("'{}' is not a procedure", name))),
                None => Err(Self::undeclared(name)),
            },
        }
    }

    /// Checks that a call site supplies exactly as many arguments as the
    /// callee declares, each assignable (with integer-to-real promotion)
    /// to the matching parameter type.
    fn check_call_args(&self, name: &str, params: &[Type], arg_types: &[Type]) -> Result<(), CompileError> {
        if params.len() != arg_types.len() {
            return Err(CompileError::semantic(format!(
                "'{}' expects {} argument(s), found {}",
                name,
                params.len(),
                arg_types.len()
            )));
        }
        for (param_type, arg_type) in params.iter().zip(arg_types) {
            self.check_assignable(param_type, arg_type).map_err(|_| {
                CompileError::semantic(format!(
                    "'{}' argument type mismatch: expected {}, found {}",
                    name, param_type, arg_type
                ))
            })?;
        }
        Ok(())
    }

    fn require_boolean(&mut self, expr: &Expr) -> Result<(), CompileError> {
        let t = self.expr_type(expr)?;
        if t != Type::Boolean {
            return Err(CompileError::semantic(format!("condition must be boolean, found {}", t)));
        }
        Ok(())
    }

    fn check_assignable(&self, lhs: &Type, rhs: &Type) -> Result<(), CompileError> {
        if lhs == rhs || (*lhs == Type::Real && *rhs == Type::Integer) {
            Ok(())
        } else {
            Err(CompileError::semantic(format!("cannot assign {} to {}", rhs, lhs)))
        }
    }

    fn lvalue_type(&mut self, lvalue: &LValue) -> Result<Type, CompileError> {
        match lvalue {
            LValue::Var(name) => {
                self.table.lookup(name).map(|s| s.typ.clone()).ok_or_else(|| Self::undeclared(name))
            }
            LValue::ArrayAccess { array, index } => self.array_element_type(array, index),
        }
    }

    fn array_element_type(&mut self, array: &str, index: &Expr) -> Result<Type, CompileError> {
        let idx_type = self.expr_type(index)?;
        if idx_type != Type::Integer {
            return Err(CompileError::semantic("array index must be integer"));
        }
        let sym = self.table.lookup(array).ok_or_else(|| Self::undeclared(array))?;
        match &sym.typ {
            Type::Array { element, .. } => Ok((**element).clone()),
            Type::String => Ok(Type::Integer),
            other => Err(CompileError::semantic(format!("'{}' of type {} is not indexable", array, other))),
        }
    }

    fn expr_type(&mut self, expr: &Expr) -> Result<Type, CompileError> {
        match expr {
            Expr::Literal(lit) => Ok(match lit {
                Literal::Integer(_) => Type::Integer,
                Literal::Real(_) => Type::Real,
                Literal::Boolean(_) => Type::Boolean,
                Literal::Str(_) => Type::String,
            }),
            Expr::Var(name) => {
                self.table.lookup(name).map(|s| s.typ.clone()).ok_or_else(|| Self::undeclared(name))
            }
            Expr::ArrayAccess { array, index } => self.array_element_type(array, index),
            Expr::FuncCall { name, args } => self.visit_func_call(name, args),
            Expr::UnOp { op, expr } => {
                let t = self.expr_type(expr)?;
                match op {
                    UnOpKind::Not if t == Type::Boolean => Ok(Type::Boolean),
                    UnOpKind::Not => Err(CompileError::semantic(format!("'not' requires boolean, found {}", t))),
                    UnOpKind::Neg if t.is_numeric() => Ok(t),
                    UnOpKind::Neg => Err(CompileError::semantic(format!("unary '-' requires a numeric type, found {}", t))),
                }
            }
            Expr::BinOp { op, left, right } => self.binop_type(*op, left, right),
        }
    }

    fn visit_func_call(&mut self, name: &str, args: &[Expr]) -> Result<Type, CompileError> {
        if name.eq_ignore_ascii_case("length") {
            self.expr_type(&args[0])?;
            return Ok(Type::Integer);
        }
        match self.table.lookup(name).cloned() {
            Some(sym) if sym.kind == SymbolKind::Func => {
                let arg_types = args.iter().map(|a| self.expr_type(a)).collect::<Result<Vec<_>, _>>()?;
                self.check_call_args(name, &sym.params, &arg_types)?;
                Ok(sym.typ)
            }
            Some(_) => Err(CompileError::semantic(format!("'{}' is not a function", name))),
            None => Err(Self::undeclared(name)),
        }
    }

    fn binop_type(&mut self, op: BinOpKind, left: &Expr, right: &Expr) -> Result<Type, CompileError> {
        let lt = self.expr_type(left)?;
        let rt = self.expr_type(right)?;
        match op {
            BinOpKind::Add | BinOpKind::Sub | BinOpKind::Mul => {
                if !lt.is_numeric() || !rt.is_numeric() {
                    return Err(CompileError::semantic(format!(
                        "arithmetic operator requires numeric operands, found {} and {}",
                        lt, rt
                    )));
                }
                Ok(if lt == Type::Real || rt == Type::Real { Type::Real } else { Type::Integer })
            }
            BinOpKind::IntDiv | BinOpKind::Mod => {
                if lt != Type::Integer || rt != Type::Integer {
                    return Err(CompileError::semantic(format!(
                        "'{}' requires integer operands, found {} and {}",
                        if op == BinOpKind::IntDiv { "div" } else { "mod" },
                        lt,
                        rt
                    )));
                }
                Ok(Type::Integer)
            }
            BinOpKind::Div => {
                if !lt.is_numeric() || !rt.is_numeric() {
                    return Err(CompileError::semantic(format!(
                        "'/' requires numeric operands, found {} and {}",
                        lt, rt
                    )));
                }
                Ok(Type::Real)
            }
            BinOpKind::Eq | BinOpKind::Ne => {
                let compatible = (lt.is_numeric() && rt.is_numeric())
                    || (lt == Type::String && rt == Type::String)
                    || (lt == Type::Boolean && rt == Type::Boolean);
                if !compatible {
                    return Err(CompileError::semantic(format!(
                        "incompatible operand types for comparison: {} and {}",
                        lt, rt
                    )));
                }
                Ok(Type::Boolean)
            }
            // The VM's ordering families (`INF`/`SUP`/...) only exist in
            // integer/real variants, so unlike `=`/`<>` these require
            // numeric operands; rejecting string/boolean here keeps
            // codegen's matching restriction unreachable on valid input.
            BinOpKind::Lt | BinOpKind::Le | BinOpKind::Gt | BinOpKind::Ge => {
                if !lt.is_numeric() || !rt.is_numeric() {
                    return Err(CompileError::semantic(format!(
                        "ordering comparison requires numeric operands, found {} and {}",
                        lt, rt
                    )));
                }
                Ok(Type::Boolean)
            }
            BinOpKind::And | BinOpKind::Or => {
                if lt != Type::Boolean || rt != Type::Boolean {
                    return Err(CompileError::semantic(format!(
                        "'{}' requires boolean operands, found {} and {}",
                        if op == BinOpKind::And { "and" } else { "or" },
                        lt,
                        rt
                    )));
                }
                Ok(Type::Boolean)
            }
        }
    }
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::new()
    }
}

/// Analyze `program`, returning the populated global symbol table.
pub fn analyze(program: &Program) -> Result<SymbolTable, CompileError> {
    Analyzer::new().analyze(program)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;
    use crate::parser::parse;

    fn check(src: &str) -> Result<SymbolTable, CompileError> {
        let program = parse(tokenize(src).unwrap()).unwrap();
        analyze(&program)
    }

    #[test]
    fn accepts_integer_to_real_promotion() {
        assert!(check("program p; var r: real; begin r := 2; end.").is_ok());
    }

    #[test]
    fn rejects_real_to_integer_assignment() {
        let err = check("program p; var i: integer; r: real; begin i := r; end.").unwrap_err();
        assert!(matches!(err, CompileError::Semantic { .. }));
    }

    #[test]
    fn rejects_undeclared_identifier() {
        let err = check("program p; begin x := 1; end.").unwrap_err();
        match err {
            CompileError::Semantic { message } => assert_eq!(message, "Undeclared identifier 'x'"),
            _ => panic!("expected semantic error"),
        }
    }

    #[test]
    fn rejects_non_boolean_condition() {
        let err = check("program p; var x: integer; begin if x then x := 1; end.").unwrap_err();
        assert!(matches!(err, CompileError::Semantic { .. }));
    }

    #[test]
    fn rejects_redeclaration_in_same_scope() {
        let err = check("program p; var x: integer; x: real; begin end.").unwrap_err();
        assert!(matches!(err, CompileError::Semantic { .. }));
    }

    #[test]
    fn allows_recursive_function_call() {
        assert!(check(
            "program p; function f(n: integer): integer; begin if n = 0 then f := 1 else f := n * f(n - 1); end; var x: integer; begin x := f(5); end."
        )
        .is_ok());
    }

    #[test]
    fn allows_recursive_procedure_call() {
        assert!(check(
            "program p; procedure p(n: integer); begin if n > 0 then p(n - 1); end; begin p(3); end."
        )
        .is_ok());
    }

    #[test]
    fn rejects_wrong_argument_count() {
        let err = check(
            "program p; function sq(n: integer): integer; begin sq := n * n; end; var x: integer; begin x := sq(1, 2); end.",
        )
        .unwrap_err();
        assert!(matches!(err, CompileError::Semantic { .. }));
    }

    #[test]
    fn rejects_wrong_argument_type() {
        let err = check(
            "program p; function sq(n: integer): integer; begin sq := n * n; end; var s: string; x: integer; begin s := 'x'; x := sq(s); end.",
        )
        .unwrap_err();
        assert!(matches!(err, CompileError::Semantic { .. }));
    }

    #[test]
    fn allows_integer_to_real_argument_promotion() {
        assert!(check(
            "program p; function f(r: real): real; begin f := r; end; var x: real; begin x := f(2); end."
        )
        .is_ok());
    }

    #[test]
    fn rejects_non_integer_for_loop_start_bound() {
        let err = check("program p; var i: integer; s: string; begin s := 'x'; for i := s to 3 do i := i; end.")
            .unwrap_err();
        assert!(matches!(err, CompileError::Semantic { .. }));
    }

    #[test]
    fn rejects_non_integer_for_loop_end_bound() {
        let err = check("program p; var i: integer; begin for i := 1 to 1.5 do i := i; end.").unwrap_err();
        assert!(matches!(err, CompileError::Semantic { .. }));
    }

    #[test]
    fn accepts_integer_for_loop_bounds() {
        assert!(check("program p; var i: integer; begin for i := 1 to 3 do i := i; end.").is_ok());
    }

    #[test]
    fn rejects_ordering_comparison_on_strings() {
        let err = check("program p; var a: string; b: string; begin a := 'x'; b := 'y'; if a < b then a := b; end.")
            .unwrap_err();
        assert!(matches!(err, CompileError::Semantic { .. }));
    }

    #[test]
    fn rejects_ordering_comparison_on_booleans() {
        let err = check("program p; var a: boolean; b: boolean; begin if a < b then a := b; end.").unwrap_err();
        assert!(matches!(err, CompileError::Semantic { .. }));
    }

    #[test]
    fn allows_equality_comparison_on_strings() {
        assert!(check("program p; var a: string; b: string; begin a := 'x'; b := 'y'; if a = b then a := b; end.")
            .is_ok());
    }

    #[test]
    fn division_is_always_real() {
        let program = parse(tokenize("program p; var r: real; begin r := 5 / 2; end.").unwrap()).unwrap();
        let mut analyzer = Analyzer::new();
        match &program.block.statements[0] {
            Statement::Assign { expr, .. } => {
                assert_eq!(analyzer.expr_type(expr).unwrap(), Type::Real);
            }
            _ => panic!(),
        }
    }
}
