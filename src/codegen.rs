//! Code generator: walks a validated `Program` and emits the target
//! stack-VM's textual instruction listing.
//!
//! Derives its own flat name/type environment directly from the AST
//! (global layout, frame layout, subprogram signatures) rather than
//! reusing the semantic analyzer's symbol table, so this module can be
//! exercised independently of `semantic` given any already-checked
//! tree.

use crate::ast::*;
use crate::config::CompilerOptions;
use crate::error::CompileError;
use crate::types::Type;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Location {
    Global(i64),
    Frame(i64),
}

#[derive(Debug, Clone)]
struct EnvEntry {
    location: Location,
    typ: Type,
}

#[derive(Debug, Clone)]
enum Signature {
    Proc,
    Func { return_type: Type },
}

pub struct CodeGen {
    output: Vec<String>,
    label_id: usize,
    global_order: Vec<String>,
    global_offsets: HashMap<String, i64>,
    global_types: HashMap<String, Type>,
    retval_offset: i64,
    temp_offsets: Vec<i64>,
    temp_depth: usize,
    current_env: Option<HashMap<String, EnvEntry>>,
    signatures: HashMap<String, Signature>,
}

impl CodeGen {
    fn new(options: &CompilerOptions) -> Self {
        CodeGen {
            output: Vec::new(),
            label_id: 0,
            global_order: Vec::new(),
            global_offsets: HashMap::new(),
            global_types: HashMap::new(),
            retval_offset: 0,
            temp_offsets: Vec::with_capacity(options.temp_slot_pool_size),
            temp_depth: 0,
            current_env: None,
            signatures: HashMap::new(),
        }
    }

    fn emit(&mut self, line: impl Into<String>) {
        self.output.push(line.into());
    }

    fn fresh_label(&mut self, base: &str) -> String {
        self.label_id += 1;
        format!("{}{}", base, self.label_id)
    }

    // ---- layout ----------------------------------------------------

    fn collect_signatures(&mut self, block: &Block) {
        for sub in &block.subprograms {
            match sub {
                Decl::ProcedureDecl { name, block, .. } => {
                    self.signatures.insert(name.to_lowercase(), Signature::Proc);
                    self.collect_signatures(block);
                }
                Decl::FunctionDecl { name, return_type, block, .. } => {
                    self.signatures.insert(name.to_lowercase(), Signature::Func { return_type: return_type.clone() });
                    self.collect_signatures(block);
                }
                _ => unreachable!("block.subprograms only ever holds Procedure/FunctionDecl"),
            }
        }
    }

    fn layout_globals(&mut self, block: &Block, options: &CompilerOptions) {
        let mut offset = 0i64;
        for decl in &block.declarations {
            if let Decl::VarDecl { name, typ } = decl {
                let key = name.to_lowercase();
                self.global_order.push(key.clone());
                self.global_offsets.insert(key.clone(), offset);
                self.global_types.insert(key, typ.clone());
                offset += 1;
            }
        }
        self.retval_offset = offset;
        offset += 1;
        for i in 0..options.temp_slot_pool_size as i64 {
            self.temp_offsets.push(offset + i);
        }
    }

    fn init_arrays(&mut self) {
        for key in self.global_order.clone() {
            let typ = self.global_types.get(&key).unwrap().clone();
            if let Type::Array { .. } = typ {
                let size = typ.array_size().unwrap();
                let offset = self.global_offsets[&key];
                self.emit(format!("PUSHI {}", size));
                self.emit("ALLOCN");
                self.emit(format!("STOREG {}", offset));
            }
        }
    }

    fn build_env(&self, func: Option<(&str, &Type)>, params: &[Param], block: &Block) -> (HashMap<String, EnvEntry>, i64) {
        let mut env = HashMap::new();
        let param_count = params.len() as i64;
        for (idx, p) in params.iter().enumerate() {
            let offset = idx as i64 - param_count;
            env.insert(p.name.to_lowercase(), EnvEntry { location: Location::Frame(offset), typ: p.typ.clone() });
        }
        let mut next_local = 1i64;
        if let Some((name, return_type)) = func {
            env.insert(name.to_lowercase(), EnvEntry { location: Location::Frame(next_local), typ: return_type.clone() });
            next_local += 1;
        }
        for decl in &block.declarations {
            if let Decl::VarDecl { name, typ } = decl {
                env.insert(name.to_lowercase(), EnvEntry { location: Location::Frame(next_local), typ: typ.clone() });
                next_local += 1;
            }
        }
        (env, next_local - 1)
    }

    fn resolve(&self, name: &str) -> Result<(Location, Type), CompileError> {
        let key = name.to_lowercase();
        if let Some(env) = &self.current_env {
            if let Some(e) = env.get(&key) {
                return Ok((e.location, e.typ.clone()));
            }
        }
        if let Some(off) = self.global_offsets.get(&key) {
            return Ok((Location::Global(*off), self.global_types.get(&key).cloned().unwrap()));
        }
        Err(CompileError::codegen(format!("unknown identifier '{}'", name)))
    }

    fn emit_push_location(&mut self, loc: &Location) {
        match loc {
            Location::Global(n) => self.emit(format!("PUSHG {}", n)),
            Location::Frame(n) => self.emit(format!("PUSHL {}", n)),
        }
    }

    fn emit_store_location(&mut self, loc: &Location) {
        match loc {
            Location::Global(n) => self.emit(format!("STOREG {}", n)),
            Location::Frame(n) => self.emit(format!("STOREL {}", n)),
        }
    }

    // ---- top level ---------------------------------------------------

    fn generate_program(&mut self, program: &Program, options: &CompilerOptions) -> Result<(), CompileError> {
        self.collect_signatures(&program.block);
        self.layout_globals(&program.block, options);

        self.emit("START");
        self.emit("JUMP MAIN");
        self.emit_subprograms(&program.block)?;
        self.emit("MAIN:");
        self.init_arrays();
        self.emit_statements(&program.block.statements)?;
        self.emit("STOP");
        Ok(())
    }

    fn emit_subprograms(&mut self, block: &Block) -> Result<(), CompileError> {
        for sub in &block.subprograms {
            self.emit_subprogram(sub)?;
        }
        Ok(())
    }

    fn emit_subprogram(&mut self, decl: &Decl) -> Result<(), CompileError> {
        match decl {
            Decl::ProcedureDecl { name, params, block } => {
                self.emit(format!("{}:", mangle_label(name)));
                let (env, local_count) = self.build_env(None, params, block);
                self.current_env = Some(env);
                if local_count > 0 {
                    self.emit(format!("PUSHN {}", local_count));
                }
                self.emit_statements(&block.statements)?;
                self.current_env = None;
                self.emit("RETURN");
                self.emit_subprograms(block)
            }
            Decl::FunctionDecl { name, params, return_type, block } => {
                self.emit(format!("{}:", mangle_label(name)));
                let (env, local_count) = self.build_env(Some((name.as_str(), return_type)), params, block);
                self.current_env = Some(env);
                self.emit(format!("PUSHN {}", local_count));
                self.emit_statements(&block.statements)?;
                self.emit("PUSHL 1");
                self.emit(format!("STOREG {}", self.retval_offset));
                self.current_env = None;
                self.emit("RETURN");
                self.emit_subprograms(block)
            }
            _ => unreachable!("block.subprograms only ever holds Procedure/FunctionDecl"),
        }
    }

    // ---- statements ----------------------------------------------------

    fn emit_statements(&mut self, stmts: &[Statement]) -> Result<(), CompileError> {
        for s in stmts {
            self.emit_statement(s)?;
        }
        Ok(())
    }

    fn emit_statement(&mut self, stmt: &Statement) -> Result<(), CompileError> {
        match stmt {
            Statement::Assign { target, expr } => self.emit_assign(target, expr),
            Statement::If { cond, then_branch, else_branch } => self.emit_if(cond, then_branch, else_branch.as_deref()),
            Statement::While { cond, body } => self.emit_while(cond, body),
            Statement::Repeat { body, cond } => self.emit_repeat(body, cond),
            Statement::For { var, start, end, body, direction } => self.emit_for(var, start, end, body, *direction),
            Statement::ProcCall { name, args } => self.emit_proc_call(name, args),
            Statement::Compound(stmts) => self.emit_statements(stmts),
            Statement::NoOp => Ok(()),
        }
    }

    fn emit_if(&mut self, cond: &Expr, then_branch: &Statement, else_branch: Option<&Statement>) -> Result<(), CompileError> {
        self.emit_expr(cond)?;
        match else_branch {
            Some(else_stmt) => {
                let l_else = self.fresh_label("ELSE");
                let l_end = self.fresh_label("ENDIF");
                self.emit(format!("JZ {}", l_else));
                self.emit_statement(then_branch)?;
                self.emit(format!("JUMP {}", l_end));
                self.emit(format!("{}:", l_else));
                self.emit_statement(else_stmt)?;
                self.emit(format!("{}:", l_end));
            }
            None => {
                let l_end = self.fresh_label("ENDIF");
                self.emit(format!("JZ {}", l_end));
                self.emit_statement(then_branch)?;
                self.emit(format!("{}:", l_end));
            }
        }
        Ok(())
    }

    fn emit_while(&mut self, cond: &Expr, body: &Statement) -> Result<(), CompileError> {
        let l_top = self.fresh_label("WHILE");
        let l_end = self.fresh_label("ENDWHILE");
        self.emit(format!("{}:", l_top));
        self.emit_expr(cond)?;
        self.emit(format!("JZ {}", l_end));
        self.emit_statement(body)?;
        self.emit(format!("JUMP {}", l_top));
        self.emit(format!("{}:", l_end));
        Ok(())
    }

    fn emit_repeat(&mut self, body: &[Statement], cond: &Expr) -> Result<(), CompileError> {
        let l_top = self.fresh_label("REPEAT");
        self.emit(format!("{}:", l_top));
        self.emit_statements(body)?;
        self.emit_expr(cond)?;
        self.emit(format!("JZ {}", l_top));
        Ok(())
    }

    fn emit_for(&mut self, var: &str, start: &Expr, end: &Expr, body: &Statement, direction: ForDirection) -> Result<(), CompileError> {
        let (loc, _) = self.resolve(var)?;
        self.emit_expr(start)?;
        self.emit_store_location(&loc);

        let l_top = self.fresh_label("FOR");
        let l_end = self.fresh_label("ENDFOR");
        self.emit(format!("{}:", l_top));
        self.emit_push_location(&loc);
        self.emit_expr(end)?;
        self.emit(match direction {
            ForDirection::Up => "INFEQ",
            ForDirection::Down => "SUPEQ",
        });
        self.emit(format!("JZ {}", l_end));
        self.emit_statement(body)?;
        self.emit_push_location(&loc);
        self.emit("PUSHI 1");
        self.emit(match direction {
            ForDirection::Up => "ADD",
            ForDirection::Down => "SUB",
        });
        self.emit_store_location(&loc);
        self.emit(format!("JUMP {}", l_top));
        self.emit(format!("{}:", l_end));
        Ok(())
    }

    fn emit_proc_call(&mut self, name: &str, args: &[Expr]) -> Result<(), CompileError> {
        match name.to_lowercase().as_str() {
            "writeln" => {
                for a in args {
                    let t = self.emit_expr(a)?;
                    let opcode = Self::write_opcode(&t, name)?;
                    self.emit(opcode);
                }
                self.emit("WRITELN");
                Ok(())
            }
            "readln" => {
                for a in args {
                    self.emit_readln_arg(a)?;
                }
                Ok(())
            }
            _ => match self.signatures.get(&name.to_lowercase()).cloned() {
                Some(Signature::Proc) => self.emit_call(name, args),
                Some(Signature::Func { .. }) => {
                    Err(CompileError::codegen(format!("'{}' is a function, not a procedure", name)))
                }
                None => Err(CompileError::codegen(format!("unknown identifier '{}'", name))),
            },
        }
    }

    fn write_opcode(typ: &Type, call_name: &str) -> Result<&'static str, CompileError> {
        match typ {
            Type::Integer | Type::Boolean => Ok("WRITEI"),
            Type::Real => Ok("WRITEF"),
            Type::String => Ok("WRITES"),
            Type::Array { .. } => Err(CompileError::codegen(format!("cannot pass an array to {}", call_name))),
        }
    }

    fn emit_readln_arg(&mut self, arg: &Expr) -> Result<(), CompileError> {
        match arg {
            Expr::Var(name) => {
                let (loc, typ) = self.resolve(name)?;
                self.emit("READ");
                self.emit_parse_opcode(&typ, name)?;
                self.emit_store_location(&loc);
                Ok(())
            }
            Expr::ArrayAccess { array, index } => {
                let (_, base_type) = self.resolve(array)?;
                if base_type == Type::String {
                    return Err(CompileError::codegen("cannot read into a string character"));
                }
                let elem_type = base_type
                    .array_element()
                    .cloned()
                    .ok_or_else(|| CompileError::codegen(format!("'{}' is not an array", array)))?;
                self.emit("READ");
                self.emit_parse_opcode(&elem_type, array)?;
                self.store_into_array(array, index, &elem_type)
            }
            _ => unreachable!("semantic analysis rejects non-lvalue readln arguments"),
        }
    }

    fn emit_parse_opcode(&mut self, typ: &Type, name: &str) -> Result<(), CompileError> {
        match typ {
            Type::Integer | Type::Boolean => self.emit("ATOI"),
            Type::Real => self.emit("ATOF"),
            Type::String => {}
            Type::Array { .. } => return Err(CompileError::codegen(format!("cannot read into array '{}' directly", name))),
        }
        Ok(())
    }

    fn emit_call(&mut self, name: &str, args: &[Expr]) -> Result<(), CompileError> {
        for a in args {
            self.emit_expr(a)?;
        }
        self.emit(format!("PUSHA {}", mangle_label(name)));
        self.emit("CALL");
        Ok(())
    }

    fn emit_assign(&mut self, target: &LValue, expr: &Expr) -> Result<(), CompileError> {
        match target {
            LValue::Var(name) => {
                let (loc, typ) = self.resolve(name)?;
                let expr_type = self.emit_expr(expr)?;
                self.promote_if_needed(&expr_type, &typ)?;
                self.emit_store_location(&loc);
                Ok(())
            }
            LValue::ArrayAccess { array, index } => {
                let (_, base_type) = self.resolve(array)?;
                if base_type == Type::String {
                    return Err(CompileError::codegen("cannot assign into a string character"));
                }
                let elem_type = base_type
                    .array_element()
                    .cloned()
                    .ok_or_else(|| CompileError::codegen(format!("'{}' is not an array", array)))?;
                let expr_type = self.emit_expr(expr)?;
                self.promote_if_needed(&expr_type, &elem_type)?;
                self.store_into_array(array, index, &elem_type)
            }
        }
    }

    /// Value is already on top of the operand stack; spill it, push the
    /// array's base address and bounds-shifted index, reload, `STOREN`.
    fn store_into_array(&mut self, array: &str, index: &Expr, _value_type: &Type) -> Result<(), CompileError> {
        let temp = self.next_temp_slot()?;
        self.emit(format!("STOREG {}", temp));

        let (base_loc, base_type) = self.resolve(array)?;
        let low = base_type.array_low().ok_or_else(|| CompileError::codegen(format!("'{}' is not an array", array)))?;

        self.emit_push_location(&base_loc);
        self.emit_expr(index)?;
        if low != 0 {
            self.emit(format!("PUSHI {}", low));
            self.emit("SUB");
        }
        self.emit(format!("PUSHG {}", temp));
        self.emit("STOREN");
        Ok(())
    }

    fn promote_if_needed(&mut self, actual: &Type, expected: &Type) -> Result<(), CompileError> {
        if actual == expected {
            return Ok(());
        }
        if *actual == Type::Integer && *expected == Type::Real {
            self.emit("ITOF");
            return Ok(());
        }
        Err(CompileError::codegen(format!("type mismatch: cannot store {} into {}", actual, expected)))
    }

    // ---- expressions ----------------------------------------------------

    fn emit_expr(&mut self, expr: &Expr) -> Result<Type, CompileError> {
        match expr {
            Expr::Literal(lit) => self.emit_literal(lit),
            Expr::Var(name) => {
                let (loc, typ) = self.resolve(name)?;
                self.emit_push_location(&loc);
                Ok(typ)
            }
            Expr::ArrayAccess { array, index } => self.emit_array_load(array, index),
            Expr::FuncCall { name, args } => self.emit_func_call(name, args),
            Expr::UnOp { op, expr } => self.emit_unop(*op, expr),
            Expr::BinOp { op, left, right } => self.emit_binop(*op, left, right),
        }
    }

    fn emit_literal(&mut self, lit: &Literal) -> Result<Type, CompileError> {
        match lit {
            Literal::Integer(n) => {
                self.emit(format!("PUSHI {}", n));
                Ok(Type::Integer)
            }
            Literal::Real(n) => {
                self.emit(format!("PUSHF {:?}", n));
                Ok(Type::Real)
            }
            Literal::Boolean(b) => {
                self.emit(format!("PUSHI {}", if *b { 1 } else { 0 }));
                Ok(Type::Boolean)
            }
            Literal::Str(s) => {
                self.emit(format!("PUSHS \"{}\"", escape_string(s)));
                Ok(Type::String)
            }
        }
    }

    fn emit_array_load(&mut self, array: &str, index: &Expr) -> Result<Type, CompileError> {
        let (loc, base_type) = self.resolve(array)?;
        match base_type {
            Type::Array { element, low, .. } => {
                self.emit_push_location(&loc);
                self.emit_expr(index)?;
                if low != 0 {
                    self.emit(format!("PUSHI {}", low));
                    self.emit("SUB");
                }
                self.emit("LOADN");
                Ok(*element)
            }
            Type::String => {
                self.emit_push_location(&loc);
                self.emit_expr(index)?;
                self.emit("PUSHI 1");
                self.emit("SUB");
                self.emit("CHARAT");
                Ok(Type::Integer)
            }
            other => Err(CompileError::codegen(format!("'{}' of type {} is not indexable", array, other))),
        }
    }

    fn emit_func_call(&mut self, name: &str, args: &[Expr]) -> Result<Type, CompileError> {
        if name.eq_ignore_ascii_case("length") {
            let t = self.emit_expr(&args[0])?;
            if t != Type::String {
                self.emit("STRI");
            }
            self.emit("STRLEN");
            return Ok(Type::Integer);
        }
        match self.signatures.get(&name.to_lowercase()).cloned() {
            Some(Signature::Func { return_type }) => {
                self.emit_call(name, args)?;
                self.emit(format!("PUSHG {}", self.retval_offset));
                Ok(return_type)
            }
            Some(Signature::Proc) => Err(CompileError::codegen(format!("'{}' is a procedure, not a function", name))),
            None => Err(CompileError::codegen(format!("unknown identifier '{}'", name))),
        }
    }

    fn emit_unop(&mut self, op: UnOpKind, expr: &Expr) -> Result<Type, CompileError> {
        match op {
            UnOpKind::Not => {
                let t = self.emit_expr(expr)?;
                self.emit("NOT");
                Ok(t)
            }
            UnOpKind::Neg => {
                let t = self.emit_expr(expr)?;
                match t {
                    Type::Integer => {
                        self.emit("PUSHI 0");
                        self.emit("SWAP");
                        self.emit("SUB");
                        Ok(Type::Integer)
                    }
                    Type::Real => {
                        self.emit("PUSHF 0.0");
                        self.emit("SWAP");
                        self.emit("FSUB");
                        Ok(Type::Real)
                    }
                    other => Err(CompileError::codegen(format!("cannot negate {}", other))),
                }
            }
        }
    }

    /// `=`/`<>` between a single-character string literal and a
    /// non-literal expression compare character codes as integers
    /// instead of strings.
    fn emit_binop(&mut self, op: BinOpKind, left: &Expr, right: &Expr) -> Result<Type, CompileError> {
        if matches!(op, BinOpKind::Eq | BinOpKind::Ne) {
            if let Some((left_is_literal, ch)) = single_char_literal_vs_nonliteral(left, right) {
                let code = Expr::Literal(Literal::Integer(ch as i64));
                return if left_is_literal {
                    self.emit_binop_core(op, &code, right)
                } else {
                    self.emit_binop_core(op, left, &code)
                };
            }
        }
        self.emit_binop_core(op, left, right)
    }

    fn emit_binop_core(&mut self, op: BinOpKind, left: &Expr, right: &Expr) -> Result<Type, CompileError> {
        if self.temp_depth >= self.temp_offsets.len() {
            return Err(CompileError::codegen("expression nesting exceeds the temp-slot pool depth"));
        }
        let temp = self.temp_offsets[self.temp_depth];

        self.temp_depth += 1;
        let lt = self.emit_expr(left)?;
        self.emit(format!("STOREG {}", temp));
        let rt = self.emit_expr(right)?;
        self.temp_depth -= 1;

        self.emit(format!("PUSHG {}", temp));
        self.emit("SWAP");

        match op {
            BinOpKind::Add | BinOpKind::Sub | BinOpKind::Mul | BinOpKind::IntDiv | BinOpKind::Mod | BinOpKind::Div => {
                self.emit_arith(op, lt, rt)
            }
            BinOpKind::Eq | BinOpKind::Ne | BinOpKind::Lt | BinOpKind::Le | BinOpKind::Gt | BinOpKind::Ge => {
                self.emit_compare(op, lt, rt)
            }
            BinOpKind::And => {
                self.emit("AND");
                Ok(Type::Boolean)
            }
            BinOpKind::Or => {
                self.emit("OR");
                Ok(Type::Boolean)
            }
        }
    }

    /// Stack is `[left, right]` (right on top). Promotes whichever
    /// operand is integer to real when `target` is real, using a
    /// `SWAP ITOF SWAP` dance to reach the deeper (left) operand.
    fn promote_stack_to(&mut self, lt: &Type, rt: &Type, target: &Type) {
        if *target != Type::Real {
            return;
        }
        if *rt == Type::Integer {
            self.emit("ITOF");
        }
        if *lt == Type::Integer {
            self.emit("SWAP");
            self.emit("ITOF");
            self.emit("SWAP");
        }
    }

    fn emit_arith(&mut self, op: BinOpKind, lt: Type, rt: Type) -> Result<Type, CompileError> {
        match op {
            BinOpKind::Div => {
                self.promote_stack_to(&lt, &rt, &Type::Real);
                self.emit("FDIV");
                Ok(Type::Real)
            }
            BinOpKind::IntDiv => {
                self.emit("DIV");
                Ok(Type::Integer)
            }
            BinOpKind::Mod => {
                self.emit("MOD");
                Ok(Type::Integer)
            }
            BinOpKind::Add | BinOpKind::Sub | BinOpKind::Mul => {
                let result_real = lt == Type::Real || rt == Type::Real;
                if result_real {
                    self.promote_stack_to(&lt, &rt, &Type::Real);
                }
                let opcode = match (op, result_real) {
                    (BinOpKind::Add, false) => "ADD",
                    (BinOpKind::Add, true) => "FADD",
                    (BinOpKind::Sub, false) => "SUB",
                    (BinOpKind::Sub, true) => "FSUB",
                    (BinOpKind::Mul, false) => "MUL",
                    (BinOpKind::Mul, true) => "FMUL",
                    _ => unreachable!(),
                };
                self.emit(opcode);
                Ok(if result_real { Type::Real } else { Type::Integer })
            }
            _ => unreachable!("emit_arith only called for arithmetic operators"),
        }
    }

    fn emit_compare(&mut self, op: BinOpKind, lt: Type, rt: Type) -> Result<Type, CompileError> {
        let numeric = lt.is_numeric() && rt.is_numeric();
        match op {
            BinOpKind::Eq | BinOpKind::Ne => {
                // Only coerce to real when the comparison type actually is
                // real; two integers compare as integers (EQUAL on raw
                // integers), never via a float round-trip.
                if numeric && (lt == Type::Real || rt == Type::Real) {
                    self.promote_stack_to(&lt, &rt, &Type::Real);
                }
                self.emit("EQUAL");
                if op == BinOpKind::Ne {
                    self.emit("NOT");
                }
                Ok(Type::Boolean)
            }
            BinOpKind::Lt | BinOpKind::Le | BinOpKind::Gt | BinOpKind::Ge => {
                if !numeric {
                    return Err(CompileError::codegen(format!(
                        "ordering comparison requires numeric operands, found {} and {}",
                        lt, rt
                    )));
                }
                let is_real = lt == Type::Real || rt == Type::Real;
                if is_real {
                    self.promote_stack_to(&lt, &rt, &Type::Real);
                }
                let opcode = match (op, is_real) {
                    (BinOpKind::Lt, false) => "INF",
                    (BinOpKind::Lt, true) => "FINF",
                    (BinOpKind::Le, false) => "INFEQ",
                    (BinOpKind::Le, true) => "FINFEQ",
                    (BinOpKind::Gt, false) => "SUP",
                    (BinOpKind::Gt, true) => "FSUP",
                    (BinOpKind::Ge, false) => "SUPEQ",
                    (BinOpKind::Ge, true) => "FSUPEQ",
                    _ => unreachable!(),
                };
                self.emit(opcode);
                Ok(Type::Boolean)
            }
            _ => unreachable!("emit_compare only called for comparison operators"),
        }
    }

    fn next_temp_slot(&self) -> Result<i64, CompileError> {
        self.temp_offsets
            .first()
            .copied()
            .ok_or_else(|| CompileError::codegen("temp-slot pool is empty"))
    }
}

fn single_char_literal_vs_nonliteral(left: &Expr, right: &Expr) -> Option<(bool, char)> {
    match (single_char(left), single_char(right)) {
        (Some(c), None) => Some((true, c)),
        (None, Some(c)) => Some((false, c)),
        _ => None,
    }
}

fn single_char(e: &Expr) -> Option<char> {
    match e {
        Expr::Literal(Literal::Str(s)) if s.chars().count() == 1 => s.chars().next(),
        _ => None,
    }
}

fn mangle_label(name: &str) -> String {
    let cleaned: String = name.chars().filter(|c| c.is_ascii_alphanumeric()).collect();
    format!("FN{}", cleaned)
}

fn escape_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            other => out.push(other),
        }
    }
    out
}

/// Generate the textual instruction listing for `program`.
pub fn generate(program: &Program, options: &CompilerOptions) -> Result<Vec<String>, CompileError> {
    let mut cg = CodeGen::new(options);
    cg.generate_program(program, options)?;
    Ok(cg.output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;
    use crate::parser::parse;
    use crate::semantic;

    fn compile(src: &str) -> Vec<String> {
        let program = parse(tokenize(src).unwrap()).unwrap();
        semantic::analyze(&program).unwrap();
        generate(&program, &CompilerOptions::default()).unwrap()
    }

    #[test]
    fn emits_start_jump_main_and_stop() {
        let out = compile("program p; begin end.");
        assert_eq!(out[0], "START");
        assert_eq!(out[1], "JUMP MAIN");
        assert_eq!(out[2], "MAIN:");
        assert_eq!(out.last().unwrap(), "STOP");
    }

    #[test]
    fn mangle_label_strips_non_alphanumerics() {
        assert_eq!(mangle_label("my_proc"), "FNmyproc");
        assert_eq!(mangle_label("___"), "FN");
    }

    #[test]
    fn ne_is_equal_then_not() {
        let out = compile("program p; var x: integer; begin if x <> 1 then x := 0; end.");
        let pos = out.iter().position(|l| l == "EQUAL").unwrap();
        assert_eq!(out[pos + 1], "NOT");
    }

    #[test]
    fn division_always_emits_fdiv() {
        let out = compile("program p; var r: real; begin r := 5 / 2; end.");
        assert!(out.contains(&"FDIV".to_string()));
    }

    #[test]
    fn array_global_is_allocated_in_main() {
        let out = compile("program p; var a: array[1..3] of integer; begin a[1] := 1; end.");
        let main_idx = out.iter().position(|l| l == "MAIN:").unwrap();
        assert_eq!(out[main_idx + 1], "PUSHI 3");
        assert_eq!(out[main_idx + 2], "ALLOCN");
        assert_eq!(out[main_idx + 3], "STOREG 0");
    }

    #[test]
    fn function_epilogue_stores_return_value() {
        let out = compile(
            "program p; function sq(n: integer): integer; begin sq := n * n; end; var x: integer; begin x := sq(2); end.",
        );
        let ret_store = out.windows(2).any(|w| w[0] == "PUSHL 1" && w[1].starts_with("STOREG"));
        assert!(ret_store);
    }

    #[test]
    fn for_downto_emits_supeq_and_sub() {
        let out = compile("program p; var i: integer; begin for i := 3 downto 1 do i := i; end.");
        assert!(out.contains(&"SUPEQ".to_string()));
    }

    #[test]
    fn frame_offsets_match_param_and_local_convention() {
        let out = compile(
            "program p; procedure proc(a: integer; b: integer); var c: integer; begin c := a + b; end; begin end.",
        );
        // params at -2, -1; the lone local at offset 1
        assert!(out.iter().any(|l| l == "PUSHL -2"));
        assert!(out.iter().any(|l| l == "PUSHL -1"));
        assert!(out.iter().any(|l| l == "STOREL 1"));
    }

    #[test]
    fn single_char_string_equality_compares_as_integer() {
        let out = compile("program p; var s: string; begin s := 'a'; if s = 'x' then s := 'b'; end.");
        assert!(out.iter().any(|l| l == &format!("PUSHI {}", b'x')));
    }

    #[test]
    fn integer_ordering_comparison_never_coerces_to_real() {
        let out = compile("program p; var a: integer; b: integer; begin if a < b then a := b; end.");
        assert!(out.contains(&"INF".to_string()));
        assert!(!out.contains(&"ITOF".to_string()));
    }

    #[test]
    fn integer_equality_never_coerces_to_real() {
        let out = compile("program p; var a: integer; b: integer; begin if a = b then a := b; end.");
        assert!(out.contains(&"EQUAL".to_string()));
        assert!(!out.contains(&"ITOF".to_string()));
    }

    #[test]
    fn mixed_numeric_ordering_comparison_still_coerces() {
        let out = compile("program p; var a: integer; r: real; begin if a < r then a := 1; end.");
        assert!(out.contains(&"FINF".to_string()));
        assert!(out.contains(&"ITOF".to_string()));
    }
}
