//! Recursive-descent parser producing the dialect syntax tree.

use super::ast::{BinOp, BoolOp, CmpOp, Expr, ImportName, Stmt, SyntaxError, UnaryOp};
use super::lexer::{tokenize, Tok, Token};

pub fn parse(src: &str) -> Result<Vec<Stmt>, SyntaxError> {
    let toks = tokenize(src)?;
    Parser { toks, pos: 0 }.program()
}

struct Parser {
    toks: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> &Tok {
        &self.toks[self.pos.min(self.toks.len() - 1)].tok
    }

    fn peek_at(&self, offset: usize) -> &Tok {
        &self.toks[(self.pos + offset).min(self.toks.len() - 1)].tok
    }

    fn line(&self) -> usize {
        self.toks[self.pos.min(self.toks.len() - 1)].line
    }

    fn bump(&mut self) -> Tok {
        let t = self.toks[self.pos.min(self.toks.len() - 1)].tok.clone();
        if self.pos < self.toks.len() {
            self.pos += 1;
        }
        t
    }

    fn err(&self, message: impl Into<String>) -> SyntaxError {
        SyntaxError {
            line: self.line(),
            message: message.into(),
        }
    }

    fn expect(&mut self, tok: Tok) -> Result<(), SyntaxError> {
        if *self.peek() == tok {
            self.bump();
            Ok(())
        } else {
            Err(self.err(format!(
                "expected {}, found {}",
                tok.describe(),
                self.peek().describe()
            )))
        }
    }

    fn expect_name(&mut self) -> Result<String, SyntaxError> {
        match self.peek().clone() {
            Tok::Name(n) => {
                self.bump();
                Ok(n)
            }
            other => Err(self.err(format!("expected a name, found {}", other.describe()))),
        }
    }

    fn program(mut self) -> Result<Vec<Stmt>, SyntaxError> {
        let mut stmts = Vec::new();
        loop {
            match self.peek() {
                Tok::Newline => {
                    self.bump();
                }
                Tok::Eof => break,
                Tok::Indent => return Err(self.err("unexpected indent")),
                _ => stmts.push(self.statement()?),
            }
        }
        Ok(stmts)
    }

    fn statement(&mut self) -> Result<Stmt, SyntaxError> {
        match self.peek() {
            Tok::Import => self.import_stmt(),
            Tok::From => self.from_stmt(),
            Tok::For => self.for_stmt(),
            Tok::If => self.if_stmt(),
            _ => self.simple_stmt(),
        }
    }

    fn dotted_name(&mut self) -> Result<String, SyntaxError> {
        let mut name = self.expect_name()?;
        while *self.peek() == Tok::Dot {
            self.bump();
            name.push('.');
            name.push_str(&self.expect_name()?);
        }
        Ok(name)
    }

    fn import_name(&mut self) -> Result<ImportName, SyntaxError> {
        let module = self.dotted_name()?;
        let alias = if *self.peek() == Tok::As {
            self.bump();
            Some(self.expect_name()?)
        } else {
            None
        };
        Ok(ImportName { module, alias })
    }

    fn import_stmt(&mut self) -> Result<Stmt, SyntaxError> {
        self.expect(Tok::Import)?;
        let mut names = vec![self.import_name()?];
        while *self.peek() == Tok::Comma {
            self.bump();
            names.push(self.import_name()?);
        }
        self.expect(Tok::Newline)?;
        Ok(Stmt::Import(names))
    }

    fn from_stmt(&mut self) -> Result<Stmt, SyntaxError> {
        self.expect(Tok::From)?;
        let module = self.dotted_name()?;
        self.expect(Tok::Import)?;
        let mut names = vec![self.import_name()?];
        while *self.peek() == Tok::Comma {
            self.bump();
            names.push(self.import_name()?);
        }
        self.expect(Tok::Newline)?;
        Ok(Stmt::FromImport { module, names })
    }

    fn for_stmt(&mut self) -> Result<Stmt, SyntaxError> {
        self.expect(Tok::For)?;
        let var = self.expect_name()?;
        self.expect(Tok::In)?;
        let iter = self.expr()?;
        self.expect(Tok::Colon)?;
        let body = self.block()?;
        Ok(Stmt::For { var, iter, body })
    }

    fn if_stmt(&mut self) -> Result<Stmt, SyntaxError> {
        self.expect(Tok::If)?;
        let mut branches = Vec::new();
        let cond = self.expr()?;
        self.expect(Tok::Colon)?;
        branches.push((cond, self.block()?));
        let mut orelse = Vec::new();
        loop {
            match self.peek() {
                Tok::Elif => {
                    self.bump();
                    let cond = self.expr()?;
                    self.expect(Tok::Colon)?;
                    branches.push((cond, self.block()?));
                }
                Tok::Else => {
                    self.bump();
                    self.expect(Tok::Colon)?;
                    orelse = self.block()?;
                    break;
                }
                _ => break,
            }
        }
        Ok(Stmt::If { branches, orelse })
    }

    fn block(&mut self) -> Result<Vec<Stmt>, SyntaxError> {
        self.expect(Tok::Newline)?;
        self.expect(Tok::Indent)?;
        let mut stmts = Vec::new();
        loop {
            match self.peek() {
                Tok::Newline => {
                    self.bump();
                }
                Tok::Dedent => {
                    self.bump();
                    break;
                }
                Tok::Eof => return Err(self.err("unexpected end of input inside a block")),
                _ => stmts.push(self.statement()?),
            }
        }
        if stmts.is_empty() {
            return Err(self.err("empty block"));
        }
        Ok(stmts)
    }

    fn simple_stmt(&mut self) -> Result<Stmt, SyntaxError> {
        let expr = self.expr()?;
        let stmt = if *self.peek() == Tok::Assign {
            self.bump();
            match expr {
                Expr::Name(_) | Expr::Subscript { .. } => {}
                _ => return Err(self.err("cannot assign to this expression")),
            }
            let value = self.expr()?;
            Stmt::Assign {
                target: expr,
                value,
            }
        } else {
            Stmt::Expr(expr)
        };
        self.expect(Tok::Newline)?;
        Ok(stmt)
    }

    fn expr(&mut self) -> Result<Expr, SyntaxError> {
        self.or_expr()
    }

    fn or_expr(&mut self) -> Result<Expr, SyntaxError> {
        let mut left = self.and_expr()?;
        while *self.peek() == Tok::Or {
            self.bump();
            let right = self.and_expr()?;
            left = Expr::Logic {
                op: BoolOp::Or,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn and_expr(&mut self) -> Result<Expr, SyntaxError> {
        let mut left = self.not_expr()?;
        while *self.peek() == Tok::And {
            self.bump();
            let right = self.not_expr()?;
            left = Expr::Logic {
                op: BoolOp::And,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn not_expr(&mut self) -> Result<Expr, SyntaxError> {
        if *self.peek() == Tok::Not {
            self.bump();
            let operand = self.not_expr()?;
            return Ok(Expr::Unary {
                op: UnaryOp::Not,
                operand: Box::new(operand),
            });
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Result<Expr, SyntaxError> {
        let left = self.arith()?;
        let op = match self.peek() {
            Tok::Eq => CmpOp::Eq,
            Tok::Ne => CmpOp::Ne,
            Tok::Lt => CmpOp::Lt,
            Tok::Le => CmpOp::Le,
            Tok::Gt => CmpOp::Gt,
            Tok::Ge => CmpOp::Ge,
            Tok::In => CmpOp::In,
            _ => return Ok(left),
        };
        self.bump();
        let right = self.arith()?;
        Ok(Expr::Compare {
            op,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    fn arith(&mut self) -> Result<Expr, SyntaxError> {
        let mut left = self.term()?;
        loop {
            let op = match self.peek() {
                Tok::Plus => BinOp::Add,
                Tok::Minus => BinOp::Sub,
                _ => break,
            };
            self.bump();
            let right = self.term()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn term(&mut self) -> Result<Expr, SyntaxError> {
        let mut left = self.factor()?;
        loop {
            let op = match self.peek() {
                Tok::Star => BinOp::Mul,
                Tok::Slash => BinOp::Div,
                Tok::SlashSlash => BinOp::FloorDiv,
                Tok::Percent => BinOp::Mod,
                _ => break,
            };
            self.bump();
            let right = self.factor()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn factor(&mut self) -> Result<Expr, SyntaxError> {
        match self.peek() {
            Tok::Minus => {
                self.bump();
                let operand = self.factor()?;
                Ok(Expr::Unary {
                    op: UnaryOp::Neg,
                    operand: Box::new(operand),
                })
            }
            Tok::Plus => {
                self.bump();
                self.factor()
            }
            _ => self.postfix(),
        }
    }

    fn postfix(&mut self) -> Result<Expr, SyntaxError> {
        let mut expr = self.atom()?;
        loop {
            match self.peek() {
                Tok::Dot => {
                    self.bump();
                    let attr = self.expect_name()?;
                    expr = Expr::Attribute {
                        value: Box::new(expr),
                        attr,
                    };
                }
                Tok::LBracket => {
                    self.bump();
                    let index = self.expr()?;
                    self.expect(Tok::RBracket)?;
                    expr = Expr::Subscript {
                        value: Box::new(expr),
                        index: Box::new(index),
                    };
                }
                Tok::LParen => {
                    self.bump();
                    let (args, kwargs) = self.arglist()?;
                    expr = Expr::Call {
                        func: Box::new(expr),
                        args,
                        kwargs,
                    };
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn arglist(&mut self) -> Result<(Vec<Expr>, Vec<(String, Expr)>), SyntaxError> {
        let mut args = Vec::new();
        let mut kwargs: Vec<(String, Expr)> = Vec::new();
        loop {
            if *self.peek() == Tok::RParen {
                self.bump();
                break;
            }
            if let (Tok::Name(name), Tok::Assign) = (self.peek().clone(), self.peek_at(1).clone()) {
                self.bump();
                self.bump();
                let value = self.expr()?;
                kwargs.push((name, value));
            } else {
                if !kwargs.is_empty() {
                    return Err(self.err("positional argument follows keyword argument"));
                }
                args.push(self.expr()?);
            }
            match self.peek() {
                Tok::Comma => {
                    self.bump();
                }
                Tok::RParen => {}
                other => {
                    let found = other.describe();
                    return Err(self.err(format!("expected ',' or ')', found {}", found)));
                }
            }
        }
        Ok((args, kwargs))
    }

    fn atom(&mut self) -> Result<Expr, SyntaxError> {
        match self.bump() {
            Tok::Int(v) => Ok(Expr::Int(v)),
            Tok::Float(v) => Ok(Expr::Float(v)),
            Tok::Str(s) => Ok(Expr::Str(s)),
            Tok::True => Ok(Expr::Bool(true)),
            Tok::False => Ok(Expr::Bool(false)),
            Tok::None => Ok(Expr::None),
            Tok::Name(n) => Ok(Expr::Name(n)),
            Tok::LParen => {
                if *self.peek() == Tok::RParen {
                    self.bump();
                    return Ok(Expr::Tuple(Vec::new()));
                }
                let first = self.expr()?;
                if *self.peek() == Tok::Comma {
                    let mut items = vec![first];
                    while *self.peek() == Tok::Comma {
                        self.bump();
                        if *self.peek() == Tok::RParen {
                            break;
                        }
                        items.push(self.expr()?);
                    }
                    self.expect(Tok::RParen)?;
                    Ok(Expr::Tuple(items))
                } else {
                    self.expect(Tok::RParen)?;
                    Ok(first)
                }
            }
            Tok::LBracket => {
                let mut items = Vec::new();
                loop {
                    if *self.peek() == Tok::RBracket {
                        self.bump();
                        break;
                    }
                    items.push(self.expr()?);
                    match self.peek() {
                        Tok::Comma => {
                            self.bump();
                        }
                        Tok::RBracket => {}
                        other => {
                            let found = other.describe();
                            return Err(self.err(format!("expected ',' or ']', found {}", found)));
                        }
                    }
                }
                Ok(Expr::List(items))
            }
            other => Err(SyntaxError {
                line: self.toks[(self.pos - 1).min(self.toks.len() - 1)].line,
                message: format!("unexpected {}", other.describe()),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_grouped_aggregation_chain() {
        let prog = parse("avg = df.groupby('gender')['purchase_amount'].mean()\n").unwrap();
        assert_eq!(prog.len(), 1);
        match &prog[0] {
            Stmt::Assign { target, value } => {
                assert_eq!(*target, Expr::Name("avg".into()));
                // call -> attribute 'mean' -> subscript -> call 'groupby'
                match value {
                    Expr::Call { func, args, .. } => {
                        assert!(args.is_empty());
                        assert!(matches!(&**func, Expr::Attribute { attr, .. } if attr == "mean"));
                    }
                    other => panic!("unexpected value expr: {:?}", other),
                }
            }
            other => panic!("unexpected statement: {:?}", other),
        }
    }

    #[test]
    fn parses_imports_with_aliases() {
        let prog = parse("import matplotlib.pyplot as plt, seaborn\n").unwrap();
        match &prog[0] {
            Stmt::Import(names) => {
                assert_eq!(names[0].module, "matplotlib.pyplot");
                assert_eq!(names[0].binding(), "plt");
                assert_eq!(names[1].module, "seaborn");
                assert_eq!(names[1].binding(), "seaborn");
            }
            other => panic!("unexpected statement: {:?}", other),
        }
    }

    #[test]
    fn parses_from_import() {
        let prog = parse("from os import path as p\n").unwrap();
        match &prog[0] {
            Stmt::FromImport { module, names } => {
                assert_eq!(module, "os");
                assert_eq!(names[0].module, "path");
                assert_eq!(names[0].alias.as_deref(), Some("p"));
            }
            other => panic!("unexpected statement: {:?}", other),
        }
    }

    #[test]
    fn parses_keyword_arguments_and_tuples() {
        let prog = parse("plt.figure(figsize=(8, 6))\n").unwrap();
        match &prog[0] {
            Stmt::Expr(Expr::Call { kwargs, .. }) => {
                assert_eq!(kwargs[0].0, "figsize");
                assert!(matches!(&kwargs[0].1, Expr::Tuple(items) if items.len() == 2));
            }
            other => panic!("unexpected statement: {:?}", other),
        }
    }

    #[test]
    fn parses_for_and_if_blocks() {
        let src = "for g in df['gender']:\n    if g == 'Female':\n        print(g)\n";
        let prog = parse(src).unwrap();
        match &prog[0] {
            Stmt::For { var, body, .. } => {
                assert_eq!(var, "g");
                assert!(matches!(&body[0], Stmt::If { .. }));
            }
            other => panic!("unexpected statement: {:?}", other),
        }
    }

    #[test]
    fn reports_parse_error_with_line() {
        let err = parse("x = 1\ny = )\n").unwrap_err();
        assert_eq!(err.line, 2);
        assert!(err.message.contains("unexpected"));
    }

    #[test]
    fn unclosed_paren_is_a_parse_error() {
        assert!(parse("y = ((2\n").is_err());
    }

    #[test]
    fn rejects_assignment_to_calls() {
        let err = parse("f() = 3\n").unwrap_err();
        assert!(err.message.contains("cannot assign"));
    }

    #[test]
    fn rejects_positional_after_keyword() {
        let err = parse("f(a=1, 2)\n").unwrap_err();
        assert!(err.message.contains("keyword"));
    }

    #[test]
    fn multiline_call_is_one_statement() {
        let src = "sns.barplot(x='category',\n            y='purchase_amount',\n            data=df)\n";
        let prog = parse(src).unwrap();
        assert_eq!(prog.len(), 1);
    }
}
