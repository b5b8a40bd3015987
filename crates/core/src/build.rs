//! Node constructors.
//!
//! Passes synthesize code through these helpers instead of spelling out [`Node`] literals, which
//! keeps generated trees well formed (every `stmts` slot is a `Block`, every call argument an
//! `Arg`, and so on).

use crate::ast::{Ast, BinOp, Node, NodeId, Token, UnOp};

impl Ast {
    /// Identifier leaf carrying a token with the same text.
    pub fn ident(&mut self, name: &str) -> NodeId {
        self.alloc_with_token(
            Node::Ident {
                name: name.to_string(),
            },
            Token::new(name),
        )
    }

    /// Name reference leaf (`strlen`, `Foo\Bar`, `\Exception`).
    pub fn name(&mut self, name: &str) -> NodeId {
        self.alloc_with_token(
            Node::Name {
                name: name.to_string(),
            },
            Token::new(name),
        )
    }

    /// `$name`
    pub fn var(&mut self, name: &str) -> NodeId {
        let ident = self.ident(name);
        self.alloc(Node::Variable { name: ident })
    }

    pub fn int(&mut self, value: i64) -> NodeId {
        self.alloc(Node::Int { value })
    }

    pub fn float(&mut self, value: f64) -> NodeId {
        self.alloc(Node::Float { value })
    }

    pub fn string(&mut self, value: &str) -> NodeId {
        self.alloc(Node::Str {
            value: value.to_string(),
        })
    }

    /// Constant fetch such as `true`, `false`, `null` or `PHP_EOL`.
    pub fn constant(&mut self, name: &str) -> NodeId {
        let name = self.name(name);
        self.alloc(Node::ConstFetch { name })
    }

    pub fn assign(&mut self, var: NodeId, expr: NodeId) -> NodeId {
        self.alloc(Node::Assign { var, expr })
    }

    pub fn binary(&mut self, op: BinOp, left: NodeId, right: NodeId) -> NodeId {
        self.alloc(Node::Binary { op, left, right })
    }

    pub fn unary(&mut self, op: UnOp, expr: NodeId) -> NodeId {
        self.alloc(Node::Unary { op, expr })
    }

    pub fn dim_fetch(&mut self, var: NodeId, dim: Option<NodeId>) -> NodeId {
        self.alloc(Node::ArrayDimFetch { var, dim })
    }

    pub fn arg(&mut self, value: NodeId) -> NodeId {
        self.alloc(Node::Arg {
            value,
            by_ref: false,
            unpack: false,
        })
    }

    /// Call of a named function; each expression is wrapped in an `Arg`.
    pub fn call(&mut self, function: &str, args: Vec<NodeId>) -> NodeId {
        let name = self.name(function);
        let args = args.into_iter().map(|a| self.arg(a)).collect();
        self.alloc(Node::FuncCall { name, args })
    }

    pub fn method_call(&mut self, var: NodeId, method: &str, args: Vec<NodeId>) -> NodeId {
        let name = self.ident(method);
        let args = args.into_iter().map(|a| self.arg(a)).collect();
        self.alloc(Node::MethodCall {
            var,
            name,
            args,
            nullsafe: false,
        })
    }

    pub fn property_fetch(&mut self, var: NodeId, property: &str) -> NodeId {
        let name = self.ident(property);
        self.alloc(Node::PropertyFetch {
            var,
            name,
            nullsafe: false,
        })
    }

    pub fn ternary(&mut self, cond: NodeId, then: Option<NodeId>, else_: NodeId) -> NodeId {
        self.alloc(Node::Ternary { cond, then, else_ })
    }

    pub fn isset(&mut self, vars: Vec<NodeId>) -> NodeId {
        self.alloc(Node::Isset { vars })
    }

    pub fn expr_stmt(&mut self, expr: NodeId) -> NodeId {
        self.alloc(Node::Expression { expr })
    }

    pub fn echo(&mut self, exprs: Vec<NodeId>) -> NodeId {
        self.alloc(Node::Echo { exprs })
    }

    pub fn ret(&mut self, expr: Option<NodeId>) -> NodeId {
        self.alloc(Node::Return { expr })
    }

    pub fn block(&mut self, stmts: Vec<NodeId>) -> NodeId {
        self.alloc(Node::Block { stmts })
    }

    /// `if (cond) { stmts } else { else_stmts }`
    pub fn if_stmt(
        &mut self,
        cond: NodeId,
        stmts: Vec<NodeId>,
        else_stmts: Option<Vec<NodeId>>,
    ) -> NodeId {
        let stmts = self.block(stmts);
        let else_ = else_stmts.map(|s| {
            let body = self.block(s);
            self.alloc(Node::Else { stmts: body })
        });
        self.alloc(Node::If {
            cond,
            stmts,
            elseifs: Vec::new(),
            else_,
        })
    }

    pub fn param(&mut self, name: &str, default: Option<NodeId>) -> NodeId {
        let var = self.var(name);
        self.alloc(Node::Param {
            var,
            default,
            type_hint: None,
            by_ref: false,
            variadic: false,
        })
    }

    /// `function name(params) { stmts }`
    pub fn function(&mut self, name: &str, params: Vec<NodeId>, stmts: Vec<NodeId>) -> NodeId {
        let name = self.ident(name);
        let stmts = self.block(stmts);
        self.alloc(Node::Function {
            name,
            params,
            stmts,
            by_ref: false,
            return_type: None,
        })
    }

    /// Appends a statement to the root statement list.
    pub fn push_stmt(&mut self, stmt: NodeId) {
        let root = self.root();
        if let Node::Block { stmts } = &mut self[root] {
            stmts.push(stmt);
        }
    }

    /// Builds a tree whose root block holds `stmts`.
    pub fn with_statements(mut self, stmts: Vec<NodeId>) -> Self {
        let root = self.root();
        self[root] = Node::Block { stmts };
        self
    }
}
