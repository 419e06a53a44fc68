//! Recursive-descent parser: token stream to `Program` AST.

use crate::ast::*;
use crate::error::CompileError;
use crate::lexer::{Token, TokenKind};
use crate::types::Type;

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

type PResult<T> = Result<T, CompileError>;

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Parser { tokens, pos: 0 }
    }

    fn current(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn line(&self) -> usize {
        self.current().line
    }

    fn advance(&mut self) -> Token {
        let tok = self.current().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        tok
    }

    fn check(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(&self.current().kind) == std::mem::discriminant(kind)
    }

    fn accept(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind) -> PResult<Token> {
        if self.check(&kind) {
            Ok(self.advance())
        } else {
            Err(CompileError::syntax(
                self.line(),
                format!("expected {}, found {}", kind, self.current().kind),
            ))
        }
    }

    fn expect_ident(&mut self) -> PResult<String> {
        match &self.current().kind {
            TokenKind::Ident(name) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            other => Err(CompileError::syntax(self.line(), format!("expected identifier, found {}", other))),
        }
    }

    /// Parse the whole token stream into a `Program`.
    pub fn parse(mut self) -> PResult<Program> {
        self.expect(TokenKind::Program)?;
        let name = self.expect_ident()?;
        self.expect(TokenKind::Semicolon)?;
        let block = self.parse_block()?;
        self.expect(TokenKind::Dot)?;
        self.expect(TokenKind::Eof)?;
        Ok(Program { name, block })
    }

    fn parse_block(&mut self) -> PResult<Block> {
        let mut declarations = Vec::new();
        while self.check(&TokenKind::Var) {
            declarations.extend(self.parse_var_decl_group()?);
        }

        let mut subprograms = Vec::new();
        while self.check(&TokenKind::Procedure) || self.check(&TokenKind::Function) {
            subprograms.push(self.parse_subprogram_decl()?);
        }

        while self.check(&TokenKind::Var) {
            declarations.extend(self.parse_var_decl_group()?);
        }

        let statements = self.parse_compound_statement()?;
        Ok(Block { declarations, subprograms, statements })
    }

    fn parse_var_decl_group(&mut self) -> PResult<Vec<Decl>> {
        self.expect(TokenKind::Var)?;
        let mut decls = Vec::new();
        loop {
            let names = self.parse_ident_list()?;
            self.expect(TokenKind::Colon)?;
            let typ = self.parse_type()?;
            self.expect(TokenKind::Semicolon)?;
            for name in names {
                decls.push(Decl::VarDecl { name, typ: typ.clone() });
            }
            if !matches!(self.current().kind, TokenKind::Ident(_)) {
                break;
            }
        }
        Ok(decls)
    }

    fn parse_ident_list(&mut self) -> PResult<Vec<String>> {
        let mut names = vec![self.expect_ident()?];
        while self.accept(&TokenKind::Comma) {
            names.push(self.expect_ident()?);
        }
        Ok(names)
    }

    fn parse_type(&mut self) -> PResult<Type> {
        match &self.current().kind {
            TokenKind::Integer => {
                self.advance();
                Ok(Type::Integer)
            }
            TokenKind::Real => {
                self.advance();
                Ok(Type::Real)
            }
            TokenKind::Boolean => {
                self.advance();
                Ok(Type::Boolean)
            }
            TokenKind::StringKw => {
                self.advance();
                Ok(Type::String)
            }
            TokenKind::Array => {
                self.advance();
                self.expect(TokenKind::LBrack)?;
                let low = self.expect_int_const()?;
                self.expect(TokenKind::DotDot)?;
                let high = self.expect_int_const()?;
                self.expect(TokenKind::RBrack)?;
                self.expect(TokenKind::Of)?;
                let element = self.parse_type()?;
                Ok(Type::Array { element: Box::new(element), low, high })
            }
            other => Err(CompileError::syntax(self.line(), format!("expected a type, found {}", other))),
        }
    }

    fn expect_int_const(&mut self) -> PResult<i64> {
        match self.current().kind.clone() {
            TokenKind::IntConst(n) => {
                self.advance();
                Ok(n)
            }
            other => Err(CompileError::syntax(self.line(), format!("expected integer constant, found {}", other))),
        }
    }

    fn parse_subprogram_decl(&mut self) -> PResult<Decl> {
        if self.accept(&TokenKind::Procedure) {
            let name = self.expect_ident()?;
            let params = self.parse_param_list()?;
            self.expect(TokenKind::Semicolon)?;
            let block = self.parse_block()?;
            self.expect(TokenKind::Semicolon)?;
            Ok(Decl::ProcedureDecl { name, params, block })
        } else {
            self.expect(TokenKind::Function)?;
            let name = self.expect_ident()?;
            let params = self.parse_param_list()?;
            self.expect(TokenKind::Colon)?;
            let return_type = self.parse_type()?;
            self.expect(TokenKind::Semicolon)?;
            let block = self.parse_block()?;
            self.expect(TokenKind::Semicolon)?;
            Ok(Decl::FunctionDecl { name, params, return_type, block })
        }
    }

    fn parse_param_list(&mut self) -> PResult<Vec<Param>> {
        self.expect(TokenKind::LParen)?;
        let mut params = Vec::new();
        if !self.check(&TokenKind::RParen) {
            params.extend(self.parse_param_section()?);
            while self.accept(&TokenKind::Semicolon) {
                params.extend(self.parse_param_section()?);
            }
        }
        self.expect(TokenKind::RParen)?;
        Ok(params)
    }

    fn parse_param_section(&mut self) -> PResult<Vec<Param>> {
        let names = self.parse_ident_list()?;
        self.expect(TokenKind::Colon)?;
        let typ = self.parse_type()?;
        Ok(names.into_iter().map(|name| Param { name, typ: typ.clone() }).collect())
    }

    fn parse_compound_statement(&mut self) -> PResult<Vec<Statement>> {
        self.expect(TokenKind::Begin)?;
        let stmts = self.parse_statement_list()?;
        self.expect(TokenKind::End)?;
        Ok(stmts)
    }

    fn parse_statement_list(&mut self) -> PResult<Vec<Statement>> {
        let mut stmts = Vec::new();
        let first = self.parse_statement()?;
        if first != Statement::NoOp {
            stmts.push(first);
        }
        while self.accept(&TokenKind::Semicolon) {
            let stmt = self.parse_statement()?;
            if stmt != Statement::NoOp {
                stmts.push(stmt);
            }
        }
        Ok(stmts)
    }

    fn parse_statement(&mut self) -> PResult<Statement> {
        match &self.current().kind {
            TokenKind::Begin => Ok(Statement::Compound(self.parse_compound_statement()?)),
            TokenKind::If => self.parse_if(),
            TokenKind::While => self.parse_while(),
            TokenKind::Repeat => self.parse_repeat(),
            TokenKind::For => self.parse_for(),
            TokenKind::Readln => self.parse_readln(),
            TokenKind::Writeln => self.parse_writeln(),
            TokenKind::Ident(_) => self.parse_assign_or_call(),
            _ => Ok(Statement::NoOp),
        }
    }

    fn parse_if(&mut self) -> PResult<Statement> {
        self.expect(TokenKind::If)?;
        let cond = self.parse_expr()?;
        self.expect(TokenKind::Then)?;
        let then_branch = Box::new(self.parse_statement()?);
        let else_branch = if self.accept(&TokenKind::Else) {
            Some(Box::new(self.parse_statement()?))
        } else {
            None
        };
        Ok(Statement::If { cond, then_branch, else_branch })
    }

    fn parse_while(&mut self) -> PResult<Statement> {
        self.expect(TokenKind::While)?;
        let cond = self.parse_expr()?;
        self.expect(TokenKind::Do)?;
        let body = Box::new(self.parse_statement()?);
        Ok(Statement::While { cond, body })
    }

    fn parse_repeat(&mut self) -> PResult<Statement> {
        self.expect(TokenKind::Repeat)?;
        let body = self.parse_statement_list()?;
        self.expect(TokenKind::Until)?;
        let cond = self.parse_expr()?;
        Ok(Statement::Repeat { body, cond })
    }

    fn parse_for(&mut self) -> PResult<Statement> {
        self.expect(TokenKind::For)?;
        let var = self.expect_ident()?;
        self.expect(TokenKind::Assign)?;
        let start = self.parse_expr()?;
        let direction = if self.accept(&TokenKind::To) {
            ForDirection::Up
        } else {
            self.expect(TokenKind::Downto)?;
            ForDirection::Down
        };
        let end = self.parse_expr()?;
        self.expect(TokenKind::Do)?;
        let body = Box::new(self.parse_statement()?);
        Ok(Statement::For { var, start, end, body, direction })
    }

    fn parse_readln(&mut self) -> PResult<Statement> {
        self.expect(TokenKind::Readln)?;
        let args = self.parse_call_args()?;
        Ok(Statement::ProcCall { name: "readln".to_string(), args })
    }

    fn parse_writeln(&mut self) -> PResult<Statement> {
        self.expect(TokenKind::Writeln)?;
        let args = self.parse_call_args()?;
        Ok(Statement::ProcCall { name: "writeln".to_string(), args })
    }

    fn parse_call_args(&mut self) -> PResult<Vec<Expr>> {
        let mut args = Vec::new();
        if self.accept(&TokenKind::LParen) {
            if !self.check(&TokenKind::RParen) {
                args.push(self.parse_expr()?);
                while self.accept(&TokenKind::Comma) {
                    args.push(self.parse_expr()?);
                }
            }
            self.expect(TokenKind::RParen)?;
        }
        Ok(args)
    }

    fn parse_assign_or_call(&mut self) -> PResult<Statement> {
        let name = self.expect_ident()?;

        if self.accept(&TokenKind::LBrack) {
            let index = self.parse_expr()?;
            self.expect(TokenKind::RBrack)?;
            self.expect(TokenKind::Assign)?;
            let expr = self.parse_expr()?;
            return Ok(Statement::Assign {
                target: LValue::ArrayAccess { array: name, index: Box::new(index) },
                expr,
            });
        }

        if self.accept(&TokenKind::Assign) {
            let expr = self.parse_expr()?;
            return Ok(Statement::Assign { target: LValue::Var(name), expr });
        }

        let args = self.parse_call_args()?;
        Ok(Statement::ProcCall { name, args })
    }

    // Expression grammar, precedence low to high:
    // or(1) < and(2) < comparisons(3, non-assoc) < +/-(4,left) < */div/mod(5,left)
    // < not(6, unary) < unary-(7, unary) < primary

    fn parse_expr(&mut self) -> PResult<Expr> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> PResult<Expr> {
        let mut left = self.parse_and()?;
        while self.accept(&TokenKind::Or) {
            let right = self.parse_and()?;
            left = Expr::BinOp { op: BinOpKind::Or, left: Box::new(left), right: Box::new(right) };
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> PResult<Expr> {
        let mut left = self.parse_comparison()?;
        while self.accept(&TokenKind::And) {
            let right = self.parse_comparison()?;
            left = Expr::BinOp { op: BinOpKind::And, left: Box::new(left), right: Box::new(right) };
        }
        Ok(left)
    }

    fn parse_comparison(&mut self) -> PResult<Expr> {
        let left = self.parse_additive()?;
        let op = match self.current().kind {
            TokenKind::Eq => BinOpKind::Eq,
            TokenKind::Ne => BinOpKind::Ne,
            TokenKind::Lt => BinOpKind::Lt,
            TokenKind::Le => BinOpKind::Le,
            TokenKind::Gt => BinOpKind::Gt,
            TokenKind::Ge => BinOpKind::Ge,
            _ => return Ok(left),
        };
        self.advance();
        let right = self.parse_additive()?;
        Ok(Expr::BinOp { op, left: Box::new(left), right: Box::new(right) })
    }

    fn parse_additive(&mut self) -> PResult<Expr> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.current().kind {
                TokenKind::Plus => BinOpKind::Add,
                TokenKind::Minus => BinOpKind::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            left = Expr::BinOp { op, left: Box::new(left), right: Box::new(right) };
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> PResult<Expr> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.current().kind {
                TokenKind::Times => BinOpKind::Mul,
                TokenKind::Slash => BinOpKind::Div,
                TokenKind::Div => BinOpKind::IntDiv,
                TokenKind::Mod => BinOpKind::Mod,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary()?;
            left = Expr::BinOp { op, left: Box::new(left), right: Box::new(right) };
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> PResult<Expr> {
        if self.accept(&TokenKind::Not) {
            let expr = self.parse_unary()?;
            return Ok(Expr::UnOp { op: UnOpKind::Not, expr: Box::new(expr) });
        }
        if self.accept(&TokenKind::Minus) {
            let expr = self.parse_unary()?;
            return Ok(Expr::UnOp { op: UnOpKind::Neg, expr: Box::new(expr) });
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> PResult<Expr> {
        match self.current().kind.clone() {
            TokenKind::IntConst(n) => {
                self.advance();
                Ok(Expr::Literal(Literal::Integer(n)))
            }
            TokenKind::RealConst(n) => {
                self.advance();
                Ok(Expr::Literal(Literal::Real(n)))
            }
            TokenKind::StringConst(s) => {
                self.advance();
                Ok(Expr::Literal(Literal::Str(s)))
            }
            TokenKind::True => {
                self.advance();
                Ok(Expr::Literal(Literal::Boolean(true)))
            }
            TokenKind::False => {
                self.advance();
                Ok(Expr::Literal(Literal::Boolean(false)))
            }
            TokenKind::LParen => {
                self.advance();
                let expr = self.parse_expr()?;
                self.expect(TokenKind::RParen)?;
                Ok(expr)
            }
            TokenKind::Length => {
                self.advance();
                self.expect(TokenKind::LParen)?;
                let arg = self.parse_expr()?;
                self.expect(TokenKind::RParen)?;
                Ok(Expr::FuncCall { name: "length".to_string(), args: vec![arg] })
            }
            TokenKind::Ident(name) => {
                self.advance();
                if self.accept(&TokenKind::LBrack) {
                    let index = self.parse_expr()?;
                    self.expect(TokenKind::RBrack)?;
                    return Ok(Expr::ArrayAccess { array: name, index: Box::new(index) });
                }
                if self.check(&TokenKind::LParen) {
                    let args = self.parse_call_args()?;
                    return Ok(Expr::FuncCall { name, args });
                }
                Ok(Expr::Var(name))
            }
            other => Err(CompileError::syntax(self.line(), format!("unexpected token {}", other))),
        }
    }
}

/// Parse `tokens` into a `Program`.
pub fn parse(tokens: Vec<Token>) -> PResult<Program> {
    Parser::new(tokens).parse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;

    fn parse_src(src: &str) -> Program {
        parse(tokenize(src).unwrap()).unwrap()
    }

    #[test]
    fn parses_minimal_program() {
        let p = parse_src("program p; begin end.");
        assert_eq!(p.name, "p");
        assert!(p.block.statements.is_empty());
    }

    #[test]
    fn precedence_mul_binds_tighter_than_add() {
        let p = parse_src("program p; var x: integer; begin x := 2 + 3 * 4; end.");
        match &p.block.statements[0] {
            Statement::Assign { expr, .. } => match expr {
                Expr::BinOp { op: BinOpKind::Add, right, .. } => {
                    assert!(matches!(**right, Expr::BinOp { op: BinOpKind::Mul, .. }));
                }
                _ => panic!("expected addition at top"),
            },
            _ => panic!("expected assignment"),
        }
    }

    #[test]
    fn dangling_else_binds_to_nearest_if() {
        let p = parse_src(
            "program p; var x: integer; begin if x = 1 then if x = 2 then x := 1 else x := 2; end.",
        );
        match &p.block.statements[0] {
            Statement::If { then_branch, else_branch, .. } => {
                assert!(else_branch.is_none());
                match then_branch.as_ref() {
                    Statement::If { else_branch, .. } => assert!(else_branch.is_some()),
                    _ => panic!("expected nested if"),
                }
            }
            _ => panic!("expected if"),
        }
    }

    #[test]
    fn trailing_semicolon_before_end_is_allowed() {
        let p = parse_src("program p; var x: integer; begin x := 1; end.");
        assert_eq!(p.block.statements.len(), 1);
    }

    #[test]
    fn array_type_and_access_parse() {
        let p = parse_src(
            "program p; var a: array[1..3] of integer; begin a[1] := 2; end.",
        );
        match &p.block.declarations[0] {
            Decl::VarDecl { typ: Type::Array { low, high, .. }, .. } => {
                assert_eq!((*low, *high), (1, 3));
            }
            _ => panic!("expected array decl"),
        }
    }

    #[test]
    fn unexpected_token_is_syntax_error() {
        let err = parse(tokenize("program p; begin x := ; end.").unwrap()).unwrap_err();
        assert!(matches!(err, CompileError::Syntax { .. }));
    }
}
