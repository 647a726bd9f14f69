use super::dom::{Dom, NodeType};
use super::*;

/// Quotes `value` as an XPath string literal, falling back to `concat()`
/// when it contains both quote characters.
pub fn xpath_literal(value: &str) -> String {
    if !value.contains('\'') {
        return format!("'{value}'");
    }
    if !value.contains('"') {
        return format!("\"{value}\"");
    }

    let mut parts = Vec::new();
    for (index, chunk) in value.split('\'').enumerate() {
        if index > 0 {
            parts.push("\"'\"".to_string());
        }
        if !chunk.is_empty() {
            parts.push(format!("'{chunk}'"));
        }
    }
    format!("concat({})", parts.join(", "))
}

/// Evaluates `query` against the document root and returns the matched
/// element and text nodes in document order.
pub(crate) fn evaluate(dom: &Dom, query: &str) -> Result<Vec<NodeId>> {
    let expr = XPathParser::new(query)?.parse()?;
    let context = Context {
        node: XNode::Node(dom.root),
        position: 1,
        size: 1,
    };
    let evaluator = Evaluator { dom };
    match evaluator.eval(&expr, &context)? {
        Value::Nodes(nodes) => Ok(nodes
            .into_iter()
            .filter_map(|node| match node {
                XNode::Node(id) if id != dom.root => Some(id),
                _ => None,
            })
            .collect()),
        _ => Err(Error::XPath(format!(
            "expression \"{query}\" does not select nodes"
        ))),
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Slash,
    DoubleSlash,
    LBracket,
    RBracket,
    LParen,
    RParen,
    At,
    Dot,
    DotDot,
    Comma,
    Pipe,
    Star,
    Minus,
    DoubleColon,
    Eq,
    Neq,
    Lt,
    Le,
    Gt,
    Ge,
    Literal(String),
    Number(f64),
    Name(String),
}

fn tokenize(src: &str) -> Result<Vec<Token>> {
    let chars: Vec<char> = src.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0usize;

    while i < chars.len() {
        let ch = chars[i];
        let next = chars.get(i + 1).copied();
        let (token, width) = match ch {
            c if c.is_whitespace() => {
                i += 1;
                continue;
            }
            '/' if next == Some('/') => (Token::DoubleSlash, 2),
            '/' => (Token::Slash, 1),
            '[' => (Token::LBracket, 1),
            ']' => (Token::RBracket, 1),
            '(' => (Token::LParen, 1),
            ')' => (Token::RParen, 1),
            '@' => (Token::At, 1),
            ',' => (Token::Comma, 1),
            '|' => (Token::Pipe, 1),
            '*' => (Token::Star, 1),
            '-' => (Token::Minus, 1),
            '=' => (Token::Eq, 1),
            '!' if next == Some('=') => (Token::Neq, 2),
            '<' if next == Some('=') => (Token::Le, 2),
            '<' => (Token::Lt, 1),
            '>' if next == Some('=') => (Token::Ge, 2),
            '>' => (Token::Gt, 1),
            ':' if next == Some(':') => (Token::DoubleColon, 2),
            '.' if next == Some('.') => (Token::DotDot, 2),
            '.' if !next.is_some_and(|n| n.is_ascii_digit()) => (Token::Dot, 1),
            '\'' | '"' => {
                let end = chars[i + 1..]
                    .iter()
                    .position(|c| *c == ch)
                    .map(|offset| i + 1 + offset)
                    .ok_or_else(|| Error::XPath(format!("unterminated literal in \"{src}\"")))?;
                let literal: String = chars[i + 1..end].iter().collect();
                (Token::Literal(literal), end + 1 - i)
            }
            c if c.is_ascii_digit() || c == '.' => {
                let mut end = i;
                while end < chars.len() && (chars[end].is_ascii_digit() || chars[end] == '.') {
                    end += 1;
                }
                let raw: String = chars[i..end].iter().collect();
                let number = raw
                    .parse::<f64>()
                    .map_err(|_| Error::XPath(format!("invalid number \"{raw}\"")))?;
                (Token::Number(number), end - i)
            }
            c if c.is_alphabetic() || c == '_' => {
                let mut end = i;
                while end < chars.len()
                    && (chars[end].is_alphanumeric() || matches!(chars[end], '_' | '-' | '.'))
                {
                    end += 1;
                }
                (Token::Name(chars[i..end].iter().collect()), end - i)
            }
            other => {
                return Err(Error::XPath(format!(
                    "unexpected character '{other}' in \"{src}\""
                )));
            }
        };
        tokens.push(token);
        i += width;
    }

    Ok(tokens)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    Child,
    Descendant,
    DescendantOrSelf,
    Parent,
    Ancestor,
    AncestorOrSelf,
    SelfNode,
    Attribute,
    FollowingSibling,
    PrecedingSibling,
    Following,
    Preceding,
}

impl Axis {
    fn from_name(name: &str) -> Option<Self> {
        let axis = match name {
            "child" => Self::Child,
            "descendant" => Self::Descendant,
            "descendant-or-self" => Self::DescendantOrSelf,
            "parent" => Self::Parent,
            "ancestor" => Self::Ancestor,
            "ancestor-or-self" => Self::AncestorOrSelf,
            "self" => Self::SelfNode,
            "attribute" => Self::Attribute,
            "following-sibling" => Self::FollowingSibling,
            "preceding-sibling" => Self::PrecedingSibling,
            "following" => Self::Following,
            "preceding" => Self::Preceding,
            _ => return None,
        };
        Some(axis)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum NodeTest {
    Name(String),
    Any,
    Text,
    Node,
}

#[derive(Debug, Clone, PartialEq)]
struct Step {
    axis: Axis,
    test: NodeTest,
    predicates: Vec<Expr>,
}

impl Step {
    fn descendant_or_self() -> Self {
        Self {
            axis: Axis::DescendantOrSelf,
            test: NodeTest::Node,
            predicates: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CompareOp {
    Eq,
    Neq,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Or(Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Compare(CompareOp, Box<Expr>, Box<Expr>),
    Negate(Box<Expr>),
    Union(Vec<Expr>),
    Path { absolute: bool, steps: Vec<Step> },
    Filter {
        primary: Box<Expr>,
        predicates: Vec<Expr>,
        steps: Vec<Step>,
    },
    Literal(String),
    Number(f64),
    Function(String, Vec<Expr>),
}

struct XPathParser {
    tokens: Vec<Token>,
    pos: usize,
    source: String,
}

impl XPathParser {
    fn new(source: &str) -> Result<Self> {
        Ok(Self {
            tokens: tokenize(source)?,
            pos: 0,
            source: source.to_string(),
        })
    }

    fn parse(mut self) -> Result<Expr> {
        if self.tokens.is_empty() {
            return Err(Error::XPath("empty expression".into()));
        }
        let expr = self.parse_or()?;
        if self.pos < self.tokens.len() {
            return Err(self.error("trailing tokens"));
        }
        Ok(expr)
    }

    fn error(&self, message: &str) -> Error {
        Error::XPath(format!("{message} in \"{}\"", self.source))
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset)
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &Token) -> Result<()> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(self.error(&format!("expected {token:?}")))
        }
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if matches!(self.peek(), Some(Token::Name(name)) if name == keyword) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn parse_or(&mut self) -> Result<Expr> {
        let mut left = self.parse_and()?;
        while self.eat_keyword("or") {
            let right = self.parse_and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr> {
        let mut left = self.parse_equality()?;
        while self.eat_keyword("and") {
            let right = self.parse_equality()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_equality(&mut self) -> Result<Expr> {
        let mut left = self.parse_relational()?;
        loop {
            let op = match self.peek() {
                Some(Token::Eq) => CompareOp::Eq,
                Some(Token::Neq) => CompareOp::Neq,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.parse_relational()?;
            left = Expr::Compare(op, Box::new(left), Box::new(right));
        }
    }

    fn parse_relational(&mut self) -> Result<Expr> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Lt) => CompareOp::Lt,
                Some(Token::Le) => CompareOp::Le,
                Some(Token::Gt) => CompareOp::Gt,
                Some(Token::Ge) => CompareOp::Ge,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.parse_unary()?;
            left = Expr::Compare(op, Box::new(left), Box::new(right));
        }
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        if self.eat(&Token::Minus) {
            return Ok(Expr::Negate(Box::new(self.parse_unary()?)));
        }
        self.parse_union()
    }

    fn parse_union(&mut self) -> Result<Expr> {
        let first = self.parse_path()?;
        if self.peek() != Some(&Token::Pipe) {
            return Ok(first);
        }
        let mut branches = vec![first];
        while self.eat(&Token::Pipe) {
            branches.push(self.parse_path()?);
        }
        Ok(Expr::Union(branches))
    }

    fn parse_path(&mut self) -> Result<Expr> {
        match self.peek() {
            Some(Token::Slash) => {
                self.pos += 1;
                let steps = if self.starts_step() {
                    self.parse_relative_steps()?
                } else {
                    Vec::new()
                };
                Ok(Expr::Path {
                    absolute: true,
                    steps,
                })
            }
            Some(Token::DoubleSlash) => {
                self.pos += 1;
                let mut steps = vec![Step::descendant_or_self()];
                steps.extend(self.parse_relative_steps()?);
                Ok(Expr::Path {
                    absolute: true,
                    steps,
                })
            }
            _ if self.starts_primary() => {
                let primary = self.parse_primary()?;
                let mut predicates = Vec::new();
                while self.peek() == Some(&Token::LBracket) {
                    predicates.push(self.parse_predicate()?);
                }
                let mut steps = Vec::new();
                match self.peek() {
                    Some(Token::Slash) => {
                        self.pos += 1;
                        steps = self.parse_relative_steps()?;
                    }
                    Some(Token::DoubleSlash) => {
                        self.pos += 1;
                        steps.push(Step::descendant_or_self());
                        steps.extend(self.parse_relative_steps()?);
                    }
                    _ => {}
                }
                if predicates.is_empty() && steps.is_empty() {
                    return Ok(primary);
                }
                Ok(Expr::Filter {
                    primary: Box::new(primary),
                    predicates,
                    steps,
                })
            }
            _ => Ok(Expr::Path {
                absolute: false,
                steps: self.parse_relative_steps()?,
            }),
        }
    }

    fn starts_step(&self) -> bool {
        matches!(
            self.peek(),
            Some(Token::Name(_) | Token::Star | Token::At | Token::Dot | Token::DotDot)
        )
    }

    fn starts_primary(&self) -> bool {
        match self.peek() {
            Some(Token::LParen | Token::Literal(_) | Token::Number(_)) => true,
            Some(Token::Name(name)) => {
                self.peek_at(1) == Some(&Token::LParen) && !is_node_type_name(name)
            }
            _ => false,
        }
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        match self.peek().cloned() {
            Some(Token::LParen) => {
                self.pos += 1;
                let inner = self.parse_or()?;
                self.expect(&Token::RParen)?;
                Ok(inner)
            }
            Some(Token::Literal(value)) => {
                self.pos += 1;
                Ok(Expr::Literal(value))
            }
            Some(Token::Number(value)) => {
                self.pos += 1;
                Ok(Expr::Number(value))
            }
            Some(Token::Name(name)) => {
                self.pos += 2;
                let mut args = Vec::new();
                if !self.eat(&Token::RParen) {
                    loop {
                        args.push(self.parse_or()?);
                        if self.eat(&Token::Comma) {
                            continue;
                        }
                        self.expect(&Token::RParen)?;
                        break;
                    }
                }
                Ok(Expr::Function(name, args))
            }
            _ => Err(self.error("expected primary expression")),
        }
    }

    fn parse_relative_steps(&mut self) -> Result<Vec<Step>> {
        let mut steps = vec![self.parse_step()?];
        loop {
            match self.peek() {
                Some(Token::Slash) => {
                    self.pos += 1;
                    steps.push(self.parse_step()?);
                }
                Some(Token::DoubleSlash) => {
                    self.pos += 1;
                    steps.push(Step::descendant_or_self());
                    steps.push(self.parse_step()?);
                }
                _ => return Ok(steps),
            }
        }
    }

    fn parse_step(&mut self) -> Result<Step> {
        if self.eat(&Token::Dot) {
            return Ok(Step {
                axis: Axis::SelfNode,
                test: NodeTest::Node,
                predicates: Vec::new(),
            });
        }
        if self.eat(&Token::DotDot) {
            return Ok(Step {
                axis: Axis::Parent,
                test: NodeTest::Node,
                predicates: Vec::new(),
            });
        }

        let mut axis = Axis::Child;
        if self.eat(&Token::At) {
            axis = Axis::Attribute;
        } else if self.peek_at(1) == Some(&Token::DoubleColon) {
            let Some(Token::Name(name)) = self.peek().cloned() else {
                return Err(self.error("expected axis name"));
            };
            axis = Axis::from_name(&name)
                .ok_or_else(|| self.error(&format!("unknown axis \"{name}\"")))?;
            self.pos += 2;
        }

        let test = match self.peek().cloned() {
            Some(Token::Star) => {
                self.pos += 1;
                NodeTest::Any
            }
            Some(Token::Name(name)) if self.peek_at(1) == Some(&Token::LParen) => {
                let test = match name.as_str() {
                    "text" => NodeTest::Text,
                    "node" => NodeTest::Node,
                    _ => return Err(self.error(&format!("unsupported node test \"{name}()\""))),
                };
                self.pos += 2;
                self.expect(&Token::RParen)?;
                test
            }
            Some(Token::Name(name)) => {
                self.pos += 1;
                NodeTest::Name(name.to_ascii_lowercase())
            }
            _ => return Err(self.error("expected node test")),
        };

        let mut predicates = Vec::new();
        while self.peek() == Some(&Token::LBracket) {
            predicates.push(self.parse_predicate()?);
        }
        Ok(Step {
            axis,
            test,
            predicates,
        })
    }

    fn parse_predicate(&mut self) -> Result<Expr> {
        self.expect(&Token::LBracket)?;
        let expr = self.parse_or()?;
        self.expect(&Token::RBracket)?;
        Ok(expr)
    }
}

fn is_node_type_name(name: &str) -> bool {
    matches!(
        name,
        "text" | "node" | "comment" | "processing-instruction"
    )
}

/// A node-set member. Attributes are addressed by owner and index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum XNode {
    Node(NodeId),
    Attr(NodeId, usize),
}

impl XNode {
    fn order_key(self) -> (usize, usize) {
        match self {
            Self::Node(id) => (id.0, 0),
            Self::Attr(id, index) => (id.0, index + 1),
        }
    }
}

#[derive(Debug, Clone)]
enum Value {
    Nodes(Vec<XNode>),
    Str(String),
    Num(f64),
    Bool(bool),
}

struct Context {
    node: XNode,
    position: usize,
    size: usize,
}

struct Evaluator<'a> {
    dom: &'a Dom,
}

impl Evaluator<'_> {
    fn eval(&self, expr: &Expr, ctx: &Context) -> Result<Value> {
        stacker::maybe_grow(64 * 1024, 2 * 1024 * 1024, || self.eval_inner(expr, ctx))
    }

    fn eval_inner(&self, expr: &Expr, ctx: &Context) -> Result<Value> {
        match expr {
            Expr::Or(left, right) => Ok(Value::Bool(
                self.boolean(&self.eval(left, ctx)?) || self.boolean(&self.eval(right, ctx)?),
            )),
            Expr::And(left, right) => Ok(Value::Bool(
                self.boolean(&self.eval(left, ctx)?) && self.boolean(&self.eval(right, ctx)?),
            )),
            Expr::Compare(op, left, right) => {
                let left = self.eval(left, ctx)?;
                let right = self.eval(right, ctx)?;
                Ok(Value::Bool(self.compare(*op, &left, &right)))
            }
            Expr::Negate(inner) => Ok(Value::Num(-self.number(&self.eval(inner, ctx)?))),
            Expr::Union(branches) => {
                let mut nodes = Vec::new();
                for branch in branches {
                    match self.eval(branch, ctx)? {
                        Value::Nodes(found) => nodes.extend(found),
                        _ => return Err(Error::XPath("union operand is not a node-set".into())),
                    }
                }
                Ok(Value::Nodes(sort_unique(nodes)))
            }
            Expr::Path { absolute, steps } => {
                let start = if *absolute {
                    XNode::Node(self.dom.root)
                } else {
                    ctx.node
                };
                Ok(Value::Nodes(self.apply_steps(vec![start], steps)?))
            }
            Expr::Filter {
                primary,
                predicates,
                steps,
            } => {
                let Value::Nodes(mut nodes) = self.eval(primary, ctx)? else {
                    return Err(Error::XPath("filter applied to a non node-set".into()));
                };
                for predicate in predicates {
                    nodes = self.filter(nodes, predicate)?;
                }
                Ok(Value::Nodes(self.apply_steps(nodes, steps)?))
            }
            Expr::Literal(value) => Ok(Value::Str(value.clone())),
            Expr::Number(value) => Ok(Value::Num(*value)),
            Expr::Function(name, args) => self.call(name, args, ctx),
        }
    }

    fn apply_steps(&self, mut nodes: Vec<XNode>, steps: &[Step]) -> Result<Vec<XNode>> {
        for step in steps {
            let mut next = Vec::new();
            for node in &nodes {
                let candidates: Vec<XNode> = self
                    .axis_nodes(*node, step.axis)
                    .into_iter()
                    .filter(|candidate| self.matches_test(*candidate, step))
                    .collect();
                let mut selected = candidates;
                for predicate in &step.predicates {
                    selected = self.filter(selected, predicate)?;
                }
                next.extend(selected);
            }
            nodes = sort_unique(next);
        }
        Ok(nodes)
    }

    fn filter(&self, nodes: Vec<XNode>, predicate: &Expr) -> Result<Vec<XNode>> {
        let size = nodes.len();
        let mut kept = Vec::new();
        for (index, node) in nodes.into_iter().enumerate() {
            let ctx = Context {
                node,
                position: index + 1,
                size,
            };
            let keep = match self.eval(predicate, &ctx)? {
                Value::Num(n) => n == ctx.position as f64,
                other => self.boolean(&other),
            };
            if keep {
                kept.push(node);
            }
        }
        Ok(kept)
    }

    /// Nodes along `axis` in proximity order.
    fn axis_nodes(&self, node: XNode, axis: Axis) -> Vec<XNode> {
        let dom = self.dom;
        let wrap = |ids: Vec<NodeId>| ids.into_iter().map(XNode::Node).collect::<Vec<_>>();
        let id = match node {
            XNode::Node(id) => id,
            XNode::Attr(owner, _) => {
                return match axis {
                    Axis::Parent => vec![XNode::Node(owner)],
                    Axis::SelfNode => vec![node],
                    Axis::Ancestor | Axis::AncestorOrSelf => {
                        let mut out = Vec::new();
                        if axis == Axis::AncestorOrSelf {
                            out.push(node);
                        }
                        out.push(XNode::Node(owner));
                        out.extend(wrap(self.ancestors(owner)));
                        out
                    }
                    _ => Vec::new(),
                };
            }
        };

        match axis {
            Axis::Child => wrap(dom.children(id).to_vec()),
            Axis::Descendant => wrap(dom.descendants(id)),
            Axis::DescendantOrSelf => {
                let mut out = vec![node];
                out.extend(wrap(dom.descendants(id)));
                out
            }
            Axis::Parent => wrap(dom.parent(id).into_iter().collect()),
            Axis::Ancestor => wrap(self.ancestors(id)),
            Axis::AncestorOrSelf => {
                let mut out = vec![node];
                out.extend(wrap(self.ancestors(id)));
                out
            }
            Axis::SelfNode => vec![node],
            Axis::Attribute => dom
                .element(id)
                .map(|element| {
                    (0..element.attrs.len())
                        .map(|index| XNode::Attr(id, index))
                        .collect()
                })
                .unwrap_or_default(),
            Axis::FollowingSibling | Axis::PrecedingSibling => {
                let Some(parent) = dom.parent(id) else {
                    return Vec::new();
                };
                let siblings = dom.children(parent);
                let Some(at) = siblings.iter().position(|sibling| *sibling == id) else {
                    return Vec::new();
                };
                if axis == Axis::FollowingSibling {
                    wrap(siblings[at + 1..].to_vec())
                } else {
                    wrap(siblings[..at].iter().rev().copied().collect())
                }
            }
            Axis::Following => {
                let skip = dom.descendants(id);
                wrap(
                    dom.descendants(dom.root)
                        .into_iter()
                        .filter(|other| other.0 > id.0 && !skip.contains(other))
                        .collect(),
                )
            }
            Axis::Preceding => {
                let ancestors = self.ancestors(id);
                wrap(
                    dom.descendants(dom.root)
                        .into_iter()
                        .filter(|other| other.0 < id.0 && !ancestors.contains(other))
                        .rev()
                        .collect(),
                )
            }
        }
    }

    fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut cursor = self.dom.parent(id);
        while let Some(current) = cursor {
            out.push(current);
            cursor = self.dom.parent(current);
        }
        out
    }

    fn matches_test(&self, node: XNode, step: &Step) -> bool {
        let dom = self.dom;
        match node {
            XNode::Attr(owner, index) => {
                if step.axis != Axis::Attribute
                    && !matches!(step.axis, Axis::SelfNode | Axis::AncestorOrSelf)
                {
                    return false;
                }
                match &step.test {
                    NodeTest::Any | NodeTest::Node => true,
                    NodeTest::Text => false,
                    NodeTest::Name(name) => dom
                        .element(owner)
                        .and_then(|element| element.attrs.get(index))
                        .is_some_and(|(key, _)| key == name),
                }
            }
            XNode::Node(id) => match (&step.test, &dom.nodes[id.0].node_type) {
                (NodeTest::Node, _) => true,
                (NodeTest::Text, NodeType::Text(_)) => true,
                (NodeTest::Any, NodeType::Element(_)) => step.axis != Axis::Attribute,
                (NodeTest::Name(name), NodeType::Element(element)) => {
                    step.axis != Axis::Attribute && element.tag_name.eq_ignore_ascii_case(name)
                }
                _ => false,
            },
        }
    }

    fn string_value(&self, node: XNode) -> String {
        match node {
            XNode::Node(id) => self.dom.text_content(id),
            XNode::Attr(owner, index) => self
                .dom
                .element(owner)
                .and_then(|element| element.attrs.get(index))
                .map(|(_, value)| value.clone())
                .unwrap_or_default(),
        }
    }

    fn string(&self, value: &Value) -> String {
        match value {
            Value::Nodes(nodes) => nodes
                .first()
                .map(|node| self.string_value(*node))
                .unwrap_or_default(),
            Value::Str(text) => text.clone(),
            Value::Num(n) => format_number(*n),
            Value::Bool(b) => b.to_string(),
        }
    }

    fn number(&self, value: &Value) -> f64 {
        match value {
            Value::Num(n) => *n,
            Value::Bool(b) => f64::from(u8::from(*b)),
            other => parse_number(&self.string(other)),
        }
    }

    fn boolean(&self, value: &Value) -> bool {
        match value {
            Value::Nodes(nodes) => !nodes.is_empty(),
            Value::Str(text) => !text.is_empty(),
            Value::Num(n) => *n != 0.0 && !n.is_nan(),
            Value::Bool(b) => *b,
        }
    }

    fn compare(&self, op: CompareOp, left: &Value, right: &Value) -> bool {
        match (left, right) {
            (Value::Nodes(l), Value::Nodes(r)) => l.iter().any(|a| {
                let a = self.string_value(*a);
                r.iter().any(|b| {
                    compare_atoms(
                        op,
                        &Value::Str(a.clone()),
                        &Value::Str(self.string_value(*b)),
                    )
                })
            }),
            (Value::Nodes(nodes), Value::Bool(_)) => {
                compare_atoms(op, &Value::Bool(!nodes.is_empty()), right)
            }
            (Value::Bool(_), Value::Nodes(nodes)) => {
                compare_atoms(op, left, &Value::Bool(!nodes.is_empty()))
            }
            (Value::Nodes(nodes), other) => nodes
                .iter()
                .any(|node| compare_atoms(op, &Value::Str(self.string_value(*node)), other)),
            (other, Value::Nodes(nodes)) => nodes
                .iter()
                .any(|node| compare_atoms(op, other, &Value::Str(self.string_value(*node)))),
            _ => compare_atoms(op, left, right),
        }
    }

    fn call(&self, name: &str, args: &[Expr], ctx: &Context) -> Result<Value> {
        let arity = |min: usize, max: usize| -> Result<()> {
            if args.len() < min || args.len() > max {
                return Err(Error::XPath(format!(
                    "wrong number of arguments for {name}()"
                )));
            }
            Ok(())
        };
        let arg = |index: usize| self.eval(&args[index], ctx);
        let context_string = || -> Result<String> {
            match args.first() {
                Some(expr) => Ok(self.string(&self.eval(expr, ctx)?)),
                None => Ok(self.string_value(ctx.node)),
            }
        };

        let value = match name {
            "last" => {
                arity(0, 0)?;
                Value::Num(ctx.size as f64)
            }
            "position" => {
                arity(0, 0)?;
                Value::Num(ctx.position as f64)
            }
            "count" => {
                arity(1, 1)?;
                match arg(0)? {
                    Value::Nodes(nodes) => Value::Num(nodes.len() as f64),
                    _ => return Err(Error::XPath("count() expects a node-set".into())),
                }
            }
            "local-name" | "name" => {
                arity(0, 1)?;
                let node = match args.first() {
                    Some(expr) => match self.eval(expr, ctx)? {
                        Value::Nodes(nodes) => nodes.first().copied(),
                        _ => return Err(Error::XPath(format!("{name}() expects a node-set"))),
                    },
                    None => Some(ctx.node),
                };
                Value::Str(node.map(|node| self.node_name(node)).unwrap_or_default())
            }
            "string" => {
                arity(0, 1)?;
                Value::Str(context_string()?)
            }
            "concat" => {
                if args.len() < 2 {
                    return Err(Error::XPath("concat() expects at least two arguments".into()));
                }
                let mut out = String::new();
                for index in 0..args.len() {
                    out.push_str(&self.string(&arg(index)?));
                }
                Value::Str(out)
            }
            "starts-with" | "contains" | "substring-before" | "substring-after" => {
                arity(2, 2)?;
                let haystack = self.string(&arg(0)?);
                let needle = self.string(&arg(1)?);
                match name {
                    "starts-with" => Value::Bool(haystack.starts_with(&needle)),
                    "contains" => Value::Bool(haystack.contains(&needle)),
                    "substring-before" => Value::Str(
                        haystack
                            .find(&needle)
                            .map(|at| haystack[..at].to_string())
                            .unwrap_or_default(),
                    ),
                    _ => Value::Str(
                        haystack
                            .find(&needle)
                            .map(|at| haystack[at + needle.len()..].to_string())
                            .unwrap_or_default(),
                    ),
                }
            }
            "substring" => {
                arity(2, 3)?;
                let source: Vec<char> = self.string(&arg(0)?).chars().collect();
                let start = round_half_up(self.number(&arg(1)?));
                let end = if args.len() == 3 {
                    start + round_half_up(self.number(&arg(2)?))
                } else {
                    f64::INFINITY
                };
                Value::Str(
                    source
                        .iter()
                        .enumerate()
                        .filter(|(index, _)| {
                            let position = (*index + 1) as f64;
                            position >= start && position < end
                        })
                        .map(|(_, ch)| *ch)
                        .collect(),
                )
            }
            "string-length" => {
                arity(0, 1)?;
                Value::Num(context_string()?.chars().count() as f64)
            }
            "normalize-space" => {
                arity(0, 1)?;
                Value::Str(
                    context_string()?
                        .split_whitespace()
                        .collect::<Vec<_>>()
                        .join(" "),
                )
            }
            "translate" => {
                arity(3, 3)?;
                let source = self.string(&arg(0)?);
                let from: Vec<char> = self.string(&arg(1)?).chars().collect();
                let to: Vec<char> = self.string(&arg(2)?).chars().collect();
                Value::Str(
                    source
                        .chars()
                        .filter_map(|ch| match from.iter().position(|f| *f == ch) {
                            Some(index) => to.get(index).copied(),
                            None => Some(ch),
                        })
                        .collect(),
                )
            }
            "not" => {
                arity(1, 1)?;
                Value::Bool(!self.boolean(&arg(0)?))
            }
            "true" => {
                arity(0, 0)?;
                Value::Bool(true)
            }
            "false" => {
                arity(0, 0)?;
                Value::Bool(false)
            }
            "boolean" => {
                arity(1, 1)?;
                Value::Bool(self.boolean(&arg(0)?))
            }
            "number" => {
                arity(0, 1)?;
                match args.first() {
                    Some(_) => Value::Num(self.number(&arg(0)?)),
                    None => Value::Num(parse_number(&self.string_value(ctx.node))),
                }
            }
            "floor" | "ceiling" | "round" => {
                arity(1, 1)?;
                let n = self.number(&arg(0)?);
                Value::Num(match name {
                    "floor" => n.floor(),
                    "ceiling" => n.ceil(),
                    _ => round_half_up(n),
                })
            }
            "sum" => {
                arity(1, 1)?;
                match arg(0)? {
                    Value::Nodes(nodes) => Value::Num(
                        nodes
                            .iter()
                            .map(|node| parse_number(&self.string_value(*node)))
                            .sum(),
                    ),
                    _ => return Err(Error::XPath("sum() expects a node-set".into())),
                }
            }
            _ => return Err(Error::XPath(format!("unknown function {name}()"))),
        };
        Ok(value)
    }

    fn node_name(&self, node: XNode) -> String {
        match node {
            XNode::Node(id) => self.dom.tag_name(id).unwrap_or_default().to_string(),
            XNode::Attr(owner, index) => self
                .dom
                .element(owner)
                .and_then(|element| element.attrs.get(index))
                .map(|(key, _)| key.clone())
                .unwrap_or_default(),
        }
    }
}

fn compare_atoms(op: CompareOp, left: &Value, right: &Value) -> bool {
    let as_number = |value: &Value| match value {
        Value::Num(n) => *n,
        Value::Bool(b) => f64::from(u8::from(*b)),
        Value::Str(text) => parse_number(text),
        Value::Nodes(_) => f64::NAN,
    };

    match op {
        CompareOp::Eq | CompareOp::Neq => {
            let equal = match (left, right) {
                (Value::Bool(_), _) | (_, Value::Bool(_)) => {
                    atom_boolean(left) == atom_boolean(right)
                }
                (Value::Num(_), _) | (_, Value::Num(_)) => as_number(left) == as_number(right),
                (Value::Str(a), Value::Str(b)) => a == b,
                _ => false,
            };
            equal == (op == CompareOp::Eq)
        }
        CompareOp::Lt => as_number(left) < as_number(right),
        CompareOp::Le => as_number(left) <= as_number(right),
        CompareOp::Gt => as_number(left) > as_number(right),
        CompareOp::Ge => as_number(left) >= as_number(right),
    }
}

fn atom_boolean(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Num(n) => *n != 0.0 && !n.is_nan(),
        Value::Str(text) => !text.is_empty(),
        Value::Nodes(nodes) => !nodes.is_empty(),
    }
}

fn parse_number(text: &str) -> f64 {
    let trimmed = text.trim();
    let valid = !trimmed.is_empty()
        && trimmed
            .strip_prefix('-')
            .unwrap_or(trimmed)
            .chars()
            .all(|ch| ch.is_ascii_digit() || ch == '.');
    if !valid {
        return f64::NAN;
    }
    trimmed.parse::<f64>().unwrap_or(f64::NAN)
}

fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        (if n > 0.0 { "Infinity" } else { "-Infinity" }).to_string()
    } else if n.fract() == 0.0 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

fn round_half_up(n: f64) -> f64 {
    (n + 0.5).floor()
}

fn sort_unique(mut nodes: Vec<XNode>) -> Vec<XNode> {
    nodes.sort_by_key(|node| node.order_key());
    nodes.dedup();
    nodes
}
