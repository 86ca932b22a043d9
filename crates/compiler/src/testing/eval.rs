// Copyright (C) 2025 Ryan Daum <ryan.daum@gmail.com> This program is free
// software: you can redistribute it and/or modify it under the terms of the GNU
// General Public License as published by the Free Software Foundation, version
// 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! A small evaluator for lowered trees, used to check binding behaviour end to end.
//!
//! It implements the primitive node set plus a handful of builtin methods on integers, strings,
//! arrays, hashes and procs. Anything else evaluates to an error.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt::{Debug, Formatter};
use std::rc::Rc;
use std::sync::Arc;

use garnet_ir::{
    ArgumentSource, Arity, BreakId, CallingConvention, ClosureDefinition, CompiledUnit,
    ConstantScope, FindRestSide, FrameRef, KeywordArguments, Literal, MissingArgument, Node,
    PostShape, RescueMatcher, ReturnId, ReturnTarget, SplatBehavior, SuperArguments, Symbol,
};
use itertools::Itertools;

pub type Array = Rc<RefCell<Vec<Value>>>;
pub type Hash = Rc<RefCell<Vec<(Value, Value)>>>;

#[derive(Clone)]
pub enum Value {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Rc<str>),
    Sym(Symbol),
    Array(Array),
    Hash(Hash),
    Proc(Rc<ProcValue>),
    /// The missing-key sentinel of hash patterns.
    Absent,
    /// The top-level receiver.
    Main,
}

pub struct ProcValue {
    pub definition: Arc<ClosureDefinition>,
    pub captured: Rc<Frame>,
    pub lambda: bool,
    pub receiver: Value,
}

impl Value {
    pub fn array(values: Vec<Value>) -> Value {
        Value::Array(Rc::new(RefCell::new(values)))
    }

    pub fn ints(values: &[i64]) -> Value {
        Value::array(values.iter().map(|v| Value::Int(*v)).collect())
    }

    pub fn str(value: &str) -> Value {
        Value::Str(Rc::from(value))
    }

    pub fn sym(value: &str) -> Value {
        Value::Sym(Symbol::new(value))
    }

    pub fn hash(pairs: Vec<(Value, Value)>) -> Value {
        Value::Hash(Rc::new(RefCell::new(pairs)))
    }

    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Nil | Value::Bool(false))
    }

    pub fn as_proc(&self) -> Option<&Rc<ProcValue>> {
        match self {
            Value::Proc(p) => Some(p),
            _ => None,
        }
    }

    fn to_s(&self) -> String {
        match self {
            Value::Nil => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Str(s) => s.to_string(),
            Value::Sym(s) => s.to_string(),
            other => format!("{other:?}"),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil)
            | (Value::Absent, Value::Absent)
            | (Value::Main, Value::Main) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Sym(a), Value::Sym(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => *a.borrow() == *b.borrow(),
            (Value::Hash(a), Value::Hash(b)) => *a.borrow() == *b.borrow(),
            (Value::Proc(a), Value::Proc(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl Debug for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::Sym(s) => write!(f, "{s:?}"),
            Value::Array(a) => write!(
                f,
                "[{}]",
                a.borrow().iter().map(|v| format!("{v:?}")).join(", ")
            ),
            Value::Hash(h) => write!(
                f,
                "{{{}}}",
                h.borrow()
                    .iter()
                    .map(|(k, v)| format!("{k:?} => {v:?}"))
                    .join(", ")
            ),
            Value::Proc(p) => {
                let flavour = if p.lambda { " (lambda)" } else { "" };
                write!(f, "#<Proc {}{flavour}>", p.definition.kind)
            }
            Value::Absent => write!(f, "<absent>"),
            Value::Main => write!(f, "main"),
        }
    }
}

/// The arguments of one call, as received by the callee's prelude.
#[derive(Debug, Clone, Default)]
pub struct CallArgs {
    pub positional: Vec<Value>,
    pub keywords: Option<Vec<(Symbol, Value)>>,
    pub block: Option<Value>,
}

impl CallArgs {
    pub fn positional(values: Vec<Value>) -> Self {
        Self {
            positional: values,
            ..Self::default()
        }
    }
}

pub struct Frame {
    slots: RefCell<Vec<Value>>,
    parent: Option<Rc<Frame>>,
    arguments: CallArgs,
    receiver: Value,
}

impl Frame {
    fn new(width: usize, parent: Option<Rc<Frame>>, arguments: CallArgs, receiver: Value) -> Self {
        Self {
            slots: RefCell::new(vec![Value::Nil; width]),
            parent,
            arguments,
            receiver,
        }
    }

    fn at_depth(self: &Rc<Frame>, depth: u16) -> Result<Rc<Frame>, Unwind> {
        let mut frame = self.clone();
        for _ in 0..depth {
            frame = frame
                .parent
                .clone()
                .ok_or_else(|| Unwind::raise("frame depth out of range"))?;
        }
        Ok(frame)
    }

    fn read(self: &Rc<Frame>, at: FrameRef) -> Result<Value, Unwind> {
        let frame = self.at_depth(at.depth)?;
        let slots = frame.slots.borrow();
        slots
            .get(at.slot.0 as usize)
            .cloned()
            .ok_or_else(|| Unwind::raise("slot out of range"))
    }

    fn write(self: &Rc<Frame>, at: FrameRef, value: Value) -> Result<(), Unwind> {
        let frame = self.at_depth(at.depth)?;
        let mut slots = frame.slots.borrow_mut();
        match slots.get_mut(at.slot.0 as usize) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(Unwind::raise("slot out of range")),
        }
    }
}

/// Non-local exits while evaluating.
#[derive(Debug)]
pub enum Unwind {
    Break(BreakId, Value),
    Next(Value),
    /// `None` returns from the current method or script frame.
    Return(Option<ReturnId>, Value),
    Raise(String),
}

impl Unwind {
    fn raise(message: impl Into<String>) -> Self {
        Unwind::Raise(message.into())
    }
}

/// A recorded `super` call: the evaluator has no class hierarchy to dispatch it to.
#[derive(Debug, Clone, PartialEq)]
pub struct SuperCall {
    pub arguments: Vec<Value>,
    pub keywords: Option<Value>,
    pub has_block: bool,
}

type Eval = Result<Value, Unwind>;

#[derive(Default)]
pub struct Evaluator {
    methods: RefCell<HashMap<Symbol, Arc<CompiledUnit>>>,
    globals: RefCell<HashMap<Symbol, Value>>,
    instance_variables: RefCell<HashMap<Symbol, Value>>,
    class_variables: RefCell<HashMap<Symbol, Value>>,
    constants: RefCell<HashMap<Symbol, Value>>,
    once: RefCell<HashMap<usize, Value>>,
    /// Values passed to the `record` builtin, in call order.
    pub recorded: RefCell<Vec<Value>>,
    pub supers: RefCell<Vec<SuperCall>>,
}

impl Evaluator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs a top-level unit with `arguments` bound to its argument names.
    pub fn run(&self, unit: &CompiledUnit, arguments: Vec<Value>) -> Result<Value, String> {
        self.invoke_unit(unit, Value::Main, CallArgs::positional(arguments))
            .map_err(describe)
    }

    /// Calls a closure value through its own convention.
    pub fn call(&self, value: &Value, arguments: CallArgs) -> Result<Value, String> {
        let Some(proc_value) = value.as_proc() else {
            return Err(format!("not a proc: {value:?}"));
        };
        self.call_proc(proc_value, arguments).map_err(describe)
    }

    /// The proc and lambda views of one closure over `definition`, sharing a fresh top-level
    /// frame whose slots hold `captured` in order after the receiver and special-variable slots.
    pub fn instantiate(
        &self,
        definition: Arc<ClosureDefinition>,
        captured: Vec<Value>,
    ) -> (Value, Value) {
        let mut slots = vec![Value::Main, Value::Nil];
        slots.extend(captured);
        let frame = Rc::new(Frame {
            slots: RefCell::new(slots),
            parent: None,
            arguments: CallArgs::default(),
            receiver: Value::Main,
        });
        let view = |lambda| {
            Value::Proc(Rc::new(ProcValue {
                definition: definition.clone(),
                captured: frame.clone(),
                lambda,
                receiver: Value::Main,
            }))
        };
        (view(false), view(true))
    }

    /// The `index`th captured value of a closure made by [`Evaluator::instantiate`].
    pub fn captured(&self, closure: &Value, index: usize) -> Option<Value> {
        let proc_value = closure.as_proc()?;
        let slots = proc_value.captured.slots.borrow();
        slots.get(index + 2).cloned()
    }

    pub fn global(&self, name: &str) -> Option<Value> {
        self.globals.borrow().get(&Symbol::new(name)).cloned()
    }

    pub fn set_global(&self, name: &str, value: Value) {
        self.globals.borrow_mut().insert(Symbol::new(name), value);
    }

    pub fn set_instance_variable(&self, name: &str, value: Value) {
        self.instance_variables
            .borrow_mut()
            .insert(Symbol::new(name), value);
    }

    pub fn set_class_variable(&self, name: &str, value: Value) {
        self.class_variables
            .borrow_mut()
            .insert(Symbol::new(name), value);
    }

    pub fn set_constant(&self, name: &str, value: Value) {
        self.constants.borrow_mut().insert(Symbol::new(name), value);
    }

    pub fn instance_variable(&self, name: &str) -> Option<Value> {
        self.instance_variables
            .borrow()
            .get(&Symbol::new(name))
            .cloned()
    }

    fn invoke_unit(&self, unit: &CompiledUnit, receiver: Value, arguments: CallArgs) -> Eval {
        let frame = Rc::new(Frame::new(unit.frame.width(), None, arguments, receiver));
        match self.eval(&unit.body, &frame) {
            Err(Unwind::Return(None, value)) => Ok(value),
            Err(Unwind::Return(Some(id), value)) if id == unit.return_id => Ok(value),
            other => other,
        }
    }

    fn call_proc(&self, proc_value: &Rc<ProcValue>, arguments: CallArgs) -> Eval {
        let convention = if proc_value.lambda {
            CallingConvention::Lambda
        } else {
            CallingConvention::Proc
        };
        let root = proc_value
            .definition
            .targets
            .entry(convention)
            .ok_or_else(|| Unwind::raise(format!("no {convention} entry")))?;
        let frame = Rc::new(Frame::new(
            proc_value.definition.frame.width(),
            Some(proc_value.captured.clone()),
            arguments,
            proc_value.receiver.clone(),
        ));
        let result = self
            .eval(&root.prelude, &frame)
            .and_then(|_| self.eval(&root.body, &frame));
        match result {
            Err(Unwind::Next(value)) => Ok(value),
            Err(Unwind::Return(Some(id), value)) if proc_value.lambda && id == root.return_id => {
                Ok(value)
            }
            Err(Unwind::Break(id, value)) if proc_value.lambda && id == root.break_id => Ok(value),
            other => other,
        }
    }

    fn eval_all(&self, nodes: &[Node], frame: &Rc<Frame>) -> Result<Vec<Value>, Unwind> {
        nodes.iter().map(|n| self.eval(n, frame)).collect()
    }

    fn array_of(&self, node: &Node, frame: &Rc<Frame>) -> Result<Vec<Value>, Unwind> {
        match self.eval(node, frame)? {
            Value::Array(array) => Ok(array.borrow().clone()),
            other => Err(Unwind::raise(format!("expected an array, got {other:?}"))),
        }
    }

    fn source_values(
        &self,
        source: ArgumentSource,
        frame: &Rc<Frame>,
    ) -> Result<Vec<Value>, Unwind> {
        match source {
            ArgumentSource::Arguments => Ok(frame.arguments.positional.clone()),
            ArgumentSource::Array(at) => match frame.read(at)? {
                Value::Array(array) => Ok(array.borrow().clone()),
                other => Err(Unwind::raise(format!("expected an array, got {other:?}"))),
            },
        }
    }

    fn call_arguments(
        &self,
        nodes: &[Node],
        splatted: bool,
        keywords: &KeywordArguments,
        frame: &Rc<Frame>,
    ) -> Result<CallArgs, Unwind> {
        let mut positional = if splatted {
            match nodes.first() {
                Some(node) => self.array_of(node, frame)?,
                None => vec![],
            }
        } else {
            self.eval_all(nodes, frame)?
        };
        let keywords = match keywords {
            KeywordArguments::None => None,
            KeywordArguments::Literal(_) | KeywordArguments::Splat => match positional.pop() {
                Some(Value::Hash(hash)) => {
                    let pairs = hash.borrow();
                    let mut keywords = vec![];
                    for (key, value) in pairs.iter() {
                        match key {
                            Value::Sym(name) => keywords.push((name.clone(), value.clone())),
                            other => {
                                return Err(Unwind::raise(format!("bad keyword {other:?}")));
                            }
                        }
                    }
                    (!keywords.is_empty()).then_some(keywords)
                }
                Some(other) => return Err(Unwind::raise(format!("bad keywords {other:?}"))),
                None => None,
            },
        };
        Ok(CallArgs {
            positional,
            keywords,
            block: None,
        })
    }

    fn check_arity(&self, arity: &Arity, frame: &Rc<Frame>) -> Result<(), Unwind> {
        let given = frame.arguments.positional.len();
        if !arity.accepts(given) {
            return Err(Unwind::raise(format!(
                "wrong number of arguments (given {given}, expected {})",
                arity.required
            )));
        }
        self.check_keywords(arity, frame)
    }

    fn check_keywords(&self, arity: &Arity, frame: &Rc<Frame>) -> Result<(), Unwind> {
        let passed = frame.arguments.keywords.as_deref().unwrap_or_default();
        for required in arity.required_keyword_names() {
            if !passed.iter().any(|(name, _)| name == required) {
                return Err(Unwind::raise(format!("missing keyword: {required:?}")));
            }
        }
        if !arity.has_keyword_rest
            && let Some((unknown, _)) = passed.iter().find(|(n, _)| !arity.keywords.contains(n))
        {
            return Err(Unwind::raise(format!("unknown keyword: {unknown:?}")));
        }
        Ok(())
    }

    fn splat(&self, value: Value, behavior: SplatBehavior) -> Value {
        match (value, behavior) {
            (Value::Array(array), _) => Value::Array(array),
            (Value::Nil, SplatBehavior::ToArray) => Value::array(vec![]),
            (Value::Nil, SplatBehavior::WrapWithNil) => Value::array(vec![Value::Nil]),
            (_, SplatBehavior::ToAryOrNil) => Value::Nil,
            (other, SplatBehavior::ToArray | SplatBehavior::WrapWithNil) => {
                Value::array(vec![other])
            }
        }
    }

    fn read_post(values: &[Value], shape: PostShape, index_from_end: usize) -> Value {
        let mut n = values.len();
        if !shape.has_rest {
            n = n.min(shape.pre + shape.optional + shape.post);
        }
        let position = if n >= shape.pre + shape.post {
            n - index_from_end
        } else {
            shape.pre + shape.post - index_from_end
        };
        values.get(position).cloned().unwrap_or(Value::Nil)
    }

    fn constant_key(&self, scope: &ConstantScope, name: &Symbol) -> Result<Symbol, Unwind> {
        match scope {
            ConstantScope::Lexical { .. } | ConstantScope::TopLevel => Ok(name.clone()),
            ConstantScope::Within(_) => Err(Unwind::raise("nested constants are not supported")),
        }
    }

    pub fn eval(&self, node: &Node, frame: &Rc<Frame>) -> Eval {
        match node {
            Node::Literal(literal) => Ok(match literal {
                Literal::Nil => Value::Nil,
                Literal::True => Value::Bool(true),
                Literal::False => Value::Bool(false),
                Literal::Integer(i) => Value::Int(*i),
                Literal::Float(f) => Value::Float(*f),
                Literal::Symbol(s) => Value::Sym(s.clone()),
                Literal::Encoding(e) => Value::Str(Rc::from(e.as_str())),
                Literal::Regex { .. } => return Err(Unwind::raise("regex literals")),
            }),
            Node::StringLiteral { value, .. } => Ok(Value::Str(Rc::from(&**value))),
            Node::Interpolation(parts) => {
                let parts = self.eval_all(parts, frame)?;
                Ok(Value::str(&parts.iter().map(|p| p.to_s()).join("")))
            }
            Node::DynamicSymbol(parts) => {
                let parts = self.eval_all(parts, frame)?;
                Ok(Value::sym(&parts.iter().map(|p| p.to_s()).join("")))
            }
            Node::Once(body) => {
                let key = &**body as *const Node as usize;
                if let Some(value) = self.once.borrow().get(&key) {
                    return Ok(value.clone());
                }
                let value = self.eval(body, frame)?;
                self.once.borrow_mut().insert(key, value.clone());
                Ok(value)
            }
            Node::ArrayLiteral(elements) => Ok(Value::array(self.eval_all(elements, frame)?)),
            Node::ArrayConcat(pieces) => {
                let mut values = vec![];
                for piece in pieces {
                    values.extend(self.array_of(piece, frame)?);
                }
                Ok(Value::array(values))
            }
            Node::SplatCast { value, behavior } => {
                let value = self.eval(value, frame)?;
                Ok(self.splat(value, *behavior))
            }
            Node::HashLiteral(pairs) => {
                let mut values: Vec<(Value, Value)> = vec![];
                for (key, value) in pairs {
                    let key = self.eval(key, frame)?;
                    let value = self.eval(value, frame)?;
                    hash_store(&mut values, key, value);
                }
                Ok(Value::hash(values))
            }
            Node::HashConcat(pieces) => {
                let mut values = vec![];
                for piece in pieces {
                    match self.eval(piece, frame)? {
                        Value::Hash(hash) => {
                            for (k, v) in hash.borrow().iter() {
                                hash_store(&mut values, k.clone(), v.clone());
                            }
                        }
                        Value::Nil => {}
                        other => return Err(Unwind::raise(format!("not a hash: {other:?}"))),
                    }
                }
                Ok(Value::hash(values))
            }

            Node::ReadLocal(at) => frame.read(*at),
            Node::WriteLocal { target, value } => {
                let value = self.eval(value, frame)?;
                frame.write(*target, value.clone())?;
                Ok(value)
            }
            Node::ReadReceiver => Ok(frame.receiver.clone()),
            Node::ReadInstanceVariable(name) => Ok(self
                .instance_variables
                .borrow()
                .get(name)
                .cloned()
                .unwrap_or(Value::Nil)),
            Node::WriteInstanceVariable { name, value } => {
                let value = self.eval(value, frame)?;
                self.instance_variables
                    .borrow_mut()
                    .insert(name.clone(), value.clone());
                Ok(value)
            }
            Node::ReadClassVariable(name) => {
                self.class_variables.borrow().get(name).cloned().ok_or_else(|| {
                    Unwind::raise(format!("uninitialized class variable {name}"))
                })
            }
            Node::WriteClassVariable { name, value } => {
                let value = self.eval(value, frame)?;
                self.class_variables
                    .borrow_mut()
                    .insert(name.clone(), value.clone());
                Ok(value)
            }
            Node::ReadGlobal(name) => Ok(self
                .globals
                .borrow()
                .get(name)
                .cloned()
                .unwrap_or(Value::Nil)),
            Node::WriteGlobal { name, value } => {
                let value = self.eval(value, frame)?;
                self.globals.borrow_mut().insert(name.clone(), value.clone());
                Ok(value)
            }
            Node::ReadConstant { scope, name } => {
                let key = self.constant_key(scope, name)?;
                self.constants
                    .borrow()
                    .get(&key)
                    .cloned()
                    .ok_or_else(|| Unwind::raise(format!("uninitialized constant {name}")))
            }
            Node::WriteConstant { scope, name, value } => {
                let key = self.constant_key(scope, name)?;
                let value = self.eval(value, frame)?;
                self.constants.borrow_mut().insert(key, value.clone());
                Ok(value)
            }
            Node::IsDefined(read) => Ok(Value::Bool(match &**read {
                Node::ReadGlobal(name) => self.globals.borrow().contains_key(name),
                Node::ReadClassVariable(name) => self.class_variables.borrow().contains_key(name),
                Node::ReadConstant { name, .. } => self.constants.borrow().contains_key(name),
                _ => true,
            })),
            Node::CurrentException => Ok(Value::Nil),

            Node::Sequence(nodes) => {
                let mut last = Value::Nil;
                for node in nodes {
                    last = self.eval(node, frame)?;
                }
                Ok(last)
            }
            Node::If {
                condition,
                then,
                otherwise,
            } => {
                if self.eval(condition, frame)?.is_truthy() {
                    self.eval(then, frame)
                } else {
                    self.eval(otherwise, frame)
                }
            }
            Node::And(left, right) => {
                let left = self.eval(left, frame)?;
                if left.is_truthy() {
                    self.eval(right, frame)
                } else {
                    Ok(left)
                }
            }
            Node::Or(left, right) => {
                let left = self.eval(left, frame)?;
                if left.is_truthy() {
                    Ok(left)
                } else {
                    self.eval(right, frame)
                }
            }
            Node::Not(value) => Ok(Value::Bool(!self.eval(value, frame)?.is_truthy())),
            Node::IsNil(value) => Ok(Value::Bool(self.eval(value, frame)? == Value::Nil)),
            Node::While {
                condition,
                body,
                do_while,
            } => {
                let mut first = *do_while;
                loop {
                    if !first && !self.eval(condition, frame)?.is_truthy() {
                        return Ok(Value::Nil);
                    }
                    first = false;
                    match self.eval(body, frame) {
                        Ok(_) | Err(Unwind::Next(_)) => {}
                        Err(other) => return Err(other),
                    }
                }
            }
            Node::CatchBreak { id, body, .. } => match self.eval(body, frame) {
                Err(Unwind::Break(target, value)) if target == *id => Ok(value),
                other => other,
            },
            Node::Break { id, value, .. } => {
                let value = self.eval(value, frame)?;
                Err(Unwind::Break(id.clone(), value))
            }
            Node::Next(value) => {
                let value = self.eval(value, frame)?;
                Err(Unwind::Next(value))
            }
            Node::Return { target, value } => {
                let value = self.eval(value, frame)?;
                match target {
                    ReturnTarget::Local => Err(Unwind::Return(None, value)),
                    ReturnTarget::Dynamic(id) => Err(Unwind::Return(Some(id.clone()), value)),
                    ReturnTarget::Invalid => Err(Unwind::raise("unexpected return")),
                }
            }
            Node::TryRescue {
                body,
                clauses,
                otherwise,
            } => match self.eval(body, frame) {
                Err(Unwind::Raise(message)) => {
                    for clause in clauses {
                        if matches!(clause.matcher, RescueMatcher::StandardError) {
                            return self.eval(&clause.body, frame);
                        }
                    }
                    Err(Unwind::Raise(message))
                }
                Ok(value) => match otherwise {
                    Some(otherwise) => self.eval(otherwise, frame),
                    None => Ok(value),
                },
                other => other,
            },
            Node::Ensure { body, ensure } => {
                let result = self.eval(body, frame);
                self.eval(ensure, frame)?;
                result
            }
            Node::Line { body, .. } => self.eval(body, frame),
            Node::FlipFlop {
                begin,
                end,
                state,
                exclusive,
            } => {
                if frame.read(*state)?.is_truthy() {
                    if self.eval(end, frame)?.is_truthy() {
                        frame.write(*state, Value::Bool(false))?;
                    }
                    return Ok(Value::Bool(true));
                }
                if !self.eval(begin, frame)?.is_truthy() {
                    return Ok(Value::Bool(false));
                }
                let ended = !*exclusive && self.eval(end, frame)?.is_truthy();
                frame.write(*state, Value::Bool(!ended))?;
                Ok(Value::Bool(true))
            }
            Node::InitFlipFlopStates(slots) => {
                for slot in slots {
                    frame.write(FrameRef::local(*slot), Value::Bool(false))?;
                }
                Ok(Value::Nil)
            }
            Node::FrameOnStack { marker, body } => {
                frame.write(FrameRef::local(*marker), Value::Bool(true))?;
                let result = self.eval(body, frame);
                frame.write(FrameRef::local(*marker), Value::Bool(false))?;
                result
            }
            Node::WhenSplat { cases, value } => {
                let cases = self.array_of(cases, frame)?;
                let value = match value {
                    Some(value) => Some(self.eval(value, frame)?),
                    None => None,
                };
                Ok(Value::Bool(cases.iter().any(|case| match &value {
                    Some(value) => case == value,
                    None => case.is_truthy(),
                })))
            }
            Node::RaiseNoMatchingPattern(value) => {
                let value = self.eval(value, frame)?;
                Err(Unwind::raise(format!("NoMatchingPatternError ({value:?})")))
            }

            Node::Call(site) => {
                let receiver = self.eval(&site.receiver, frame)?;
                let mut arguments =
                    self.call_arguments(&site.arguments, site.splatted, &site.keywords, frame)?;
                arguments.block = match &site.block {
                    Some(block) => Some(self.eval(block, frame)?),
                    None => None,
                };
                let assigned = arguments.positional.last().cloned();
                let result = self.send(receiver, &site.method, arguments)?;
                if site.attribute_write {
                    return Ok(assigned.unwrap_or(Value::Nil));
                }
                Ok(result)
            }
            Node::ToProc(value) => match self.eval(value, frame)? {
                proc_value @ Value::Proc(_) => Ok(proc_value),
                Value::Nil => Ok(Value::Nil),
                other => Err(Unwind::raise(format!("can't convert {other:?} to a proc"))),
            },
            Node::Super { arguments, block } => {
                let (values, keywords) = match arguments {
                    SuperArguments::Explicit {
                        arguments,
                        splatted,
                        keywords,
                    } => {
                        let call = self.call_arguments(arguments, *splatted, keywords, frame)?;
                        let keywords = call.keywords.map(|k| {
                            Value::hash(k.into_iter().map(|(n, v)| (Value::Sym(n), v)).collect())
                        });
                        (call.positional, keywords)
                    }
                    SuperArguments::Reload {
                        arguments,
                        rest_index,
                        keywords,
                        ..
                    } => {
                        let mut values = vec![];
                        for (index, argument) in arguments.iter().enumerate() {
                            let value = self.eval(argument, frame)?;
                            match (value, *rest_index == Some(index)) {
                                (Value::Array(rest), true) => {
                                    values.extend(rest.borrow().iter().cloned())
                                }
                                (value, _) => values.push(value),
                            }
                        }
                        let keywords = match keywords {
                            Some(keywords) => Some(self.eval(keywords, frame)?),
                            None => None,
                        };
                        (values, keywords)
                    }
                };
                let has_block = match block {
                    Some(block) => self.eval(block, frame)?.is_truthy(),
                    None => false,
                };
                self.supers.borrow_mut().push(SuperCall {
                    arguments: values,
                    keywords,
                    has_block,
                });
                Ok(Value::Nil)
            }
            Node::Yield {
                block,
                arguments,
                splatted,
                keywords,
            } => {
                let block = frame.read(*block)?;
                let Some(proc_value) = block.as_proc() else {
                    return Err(Unwind::raise("no block given (yield)"));
                };
                let arguments = self.call_arguments(arguments, *splatted, keywords, frame)?;
                self.call_proc(proc_value, arguments)
            }
            Node::Closure(definition) => Ok(Value::Proc(Rc::new(ProcValue {
                definition: definition.clone(),
                captured: frame.clone(),
                lambda: definition.kind.eager_convention() == CallingConvention::Lambda,
                receiver: frame.receiver.clone(),
            }))),
            Node::MethodDefinition { name, unit, .. } => {
                self.methods.borrow_mut().insert(name.clone(), unit.clone());
                Ok(Value::Sym(name.clone()))
            }

            Node::CheckArity(arity) => {
                self.check_arity(arity, frame)?;
                Ok(Value::Nil)
            }
            Node::CheckKeywords(arity) => {
                self.check_keywords(arity, frame)?;
                Ok(Value::Nil)
            }
            Node::CheckNoKeywords => match &frame.arguments.keywords {
                Some(_) => Err(Unwind::raise("no keywords accepted")),
                None => Ok(Value::Nil),
            },
            Node::ShouldDestructure => Ok(Value::Bool(
                frame.arguments.positional.len() == 1 && frame.arguments.keywords.is_none(),
            )),
            Node::SaveMethodBlock(slot) => {
                let block = frame.arguments.block.clone().unwrap_or(Value::Nil);
                frame.write(FrameRef::local(*slot), block)?;
                Ok(Value::Nil)
            }
            Node::ReadPreArgument {
                source,
                index,
                missing,
            } => match self.source_values(*source, frame)?.get(*index) {
                Some(value) => Ok(value.clone()),
                None if *missing == MissingArgument::Nil => Ok(Value::Nil),
                None => Err(Unwind::raise("missing required argument")),
            },
            Node::ReadOptionalArgument {
                source,
                index,
                minimum,
                default,
            } => {
                let values = self.source_values(*source, frame)?;
                if values.len() >= *minimum {
                    Ok(values.get(*index).cloned().unwrap_or(Value::Nil))
                } else {
                    self.eval(default, frame)
                }
            }
            Node::ReadRestArgument { source, from, post } => {
                let values = self.source_values(*source, frame)?;
                let end = values.len().saturating_sub(*post);
                Ok(Value::array(values.get(*from..end).unwrap_or(&[]).to_vec()))
            }
            Node::ReadPostArgument {
                source,
                shape,
                index_from_end,
            } => {
                let values = self.source_values(*source, frame)?;
                Ok(Self::read_post(&values, *shape, *index_from_end))
            }
            Node::ReadKeywordArgument { name, default } => {
                let passed = frame.arguments.keywords.as_deref().unwrap_or_default();
                match passed.iter().find(|(n, _)| n == name) {
                    Some((_, value)) => Ok(value.clone()),
                    None => match default {
                        Some(default) => self.eval(default, frame),
                        None => Ok(Value::Nil),
                    },
                }
            }
            Node::ReadKeywordRest { known } => {
                let passed = frame.arguments.keywords.as_deref().unwrap_or_default();
                Ok(Value::hash(
                    passed
                        .iter()
                        .filter(|(n, _)| !known.contains(n))
                        .map(|(n, v)| (Value::Sym(n.clone()), v.clone()))
                        .collect(),
                ))
            }

            Node::ArrayIndex { array, index } => {
                let values = self.array_of(array, frame)?;
                Ok(index_from(&values, *index))
            }
            Node::ArrayIsAtLeast { array, length } => {
                Ok(Value::Bool(self.array_of(array, frame)?.len() >= *length))
            }
            Node::ArrayPatternLengthCheck {
                array,
                length,
                exact,
            } => match self.eval(array, frame)? {
                Value::Array(values) => {
                    let len = values.borrow().len();
                    Ok(Value::Bool(if *exact { len == *length } else { len >= *length }))
                }
                _ => Ok(Value::Bool(false)),
            },
            Node::DeconstructArray(value) => match self.eval(value, frame)? {
                array @ Value::Array(_) => Ok(array),
                _ => Ok(Value::Nil),
            },
            Node::DeconstructKeys { value, .. } => match self.eval(value, frame)? {
                hash @ Value::Hash(_) => Ok(hash),
                _ => Ok(Value::Nil),
            },
            Node::HashPatternValue { hash, key } => match self.eval(hash, frame)? {
                Value::Hash(hash) => Ok(hash
                    .borrow()
                    .iter()
                    .find(|(k, _)| *k == Value::Sym(key.clone()))
                    .map(|(_, v)| v.clone())
                    .unwrap_or(Value::Absent)),
                _ => Ok(Value::Absent),
            },
            Node::IsAbsent(value) => Ok(Value::Bool(self.eval(value, frame)? == Value::Absent)),
            Node::HashExcept { hash, keys } => match self.eval(hash, frame)? {
                Value::Hash(hash) => Ok(Value::hash(
                    hash.borrow()
                        .iter()
                        .filter(|(k, _)| !matches!(k, Value::Sym(s) if keys.contains(s)))
                        .cloned()
                        .collect(),
                )),
                other => Err(Unwind::raise(format!("not a hash: {other:?}"))),
            },
            Node::HashIsEmpty(hash) => match self.eval(hash, frame)? {
                Value::Hash(hash) => Ok(Value::Bool(hash.borrow().is_empty())),
                _ => Ok(Value::Bool(false)),
            },
            Node::FindPattern {
                array,
                width,
                cursor,
                matcher,
            } => {
                let len = self.array_of(array, frame)?.len();
                if len < *width {
                    return Ok(Value::Bool(false));
                }
                for position in 0..=(len - width) {
                    frame.write(*cursor, Value::Int(position as i64))?;
                    if self.eval(matcher, frame)?.is_truthy() {
                        return Ok(Value::Bool(true));
                    }
                }
                Ok(Value::Bool(false))
            }
            Node::ArrayIndexAt {
                array,
                cursor,
                offset,
            } => {
                let values = self.array_of(array, frame)?;
                let Value::Int(position) = frame.read(*cursor)? else {
                    return Err(Unwind::raise("cursor is not an integer"));
                };
                Ok(values
                    .get(position as usize + offset)
                    .cloned()
                    .unwrap_or(Value::Nil))
            }
            Node::FindPatternRest {
                array,
                cursor,
                side,
            } => {
                let values = self.array_of(array, frame)?;
                let Value::Int(position) = frame.read(*cursor)? else {
                    return Err(Unwind::raise("cursor is not an integer"));
                };
                let position = position as usize;
                Ok(Value::array(match side {
                    FindRestSide::Before => values[..position].to_vec(),
                    FindRestSide::After { width } => values[position + width..].to_vec(),
                }))
            }
            Node::ExecuteAndReturnTrue(node) => {
                self.eval(node, frame)?;
                Ok(Value::Bool(true))
            }
            other => Err(Unwind::raise(format!(
                "unsupported node: {}",
                format!("{other:?}").chars().take(40).collect::<String>()
            ))),
        }
    }

    fn send(&self, receiver: Value, method: &Symbol, arguments: CallArgs) -> Eval {
        let user_method = self.methods.borrow().get(method).cloned();
        if let Some(unit) = user_method {
            return self.invoke_unit(&unit, receiver, arguments);
        }
        let args = &arguments.positional;
        let arg = |i: usize| args.get(i).cloned().unwrap_or(Value::Nil);
        match (&receiver, method.as_str()) {
            (_, "record") => {
                self.recorded.borrow_mut().extend(args.iter().cloned());
                Ok(Value::Nil)
            }
            (_, "raise") => Err(Unwind::raise(arg(0).to_s())),
            (_, "lambda") | (_, "proc") => match &arguments.block {
                Some(Value::Proc(block)) => {
                    let lambda = method.as_str() == "lambda" || block.lambda;
                    Ok(Value::Proc(Rc::new(ProcValue {
                        definition: block.definition.clone(),
                        captured: block.captured.clone(),
                        lambda,
                        receiver: block.receiver.clone(),
                    })))
                }
                _ => Err(Unwind::raise("tried to create a proc without a block")),
            },
            (_, "at_exit") => Ok(arguments.block.clone().unwrap_or(Value::Nil)),
            (_, "==") | (_, "===") => Ok(Value::Bool(receiver == arg(0))),
            (_, "!=") => Ok(Value::Bool(receiver != arg(0))),
            (_, "nil?") => Ok(Value::Bool(receiver == Value::Nil)),
            (_, "to_s") => Ok(Value::str(&receiver.to_s())),
            (Value::Int(a), op) => {
                let Value::Int(b) = arg(0) else {
                    return Err(Unwind::raise(format!("bad operand for Integer#{op}")));
                };
                Ok(match op {
                    "+" => Value::Int(a + b),
                    "-" => Value::Int(a - b),
                    "*" => Value::Int(a * b),
                    "<" => Value::Bool(*a < b),
                    ">" => Value::Bool(*a > b),
                    "<=" => Value::Bool(*a <= b),
                    ">=" => Value::Bool(*a >= b),
                    _ => return Err(Unwind::raise(format!("undefined method Integer#{op}"))),
                })
            }
            (Value::Str(a), "+") => Ok(Value::str(&format!("{a}{}", arg(0).to_s()))),
            (Value::Array(array), "[]") => match arg(0) {
                Value::Int(i) => Ok(index_from(&array.borrow(), i)),
                other => Err(Unwind::raise(format!("bad index {other:?}"))),
            },
            (Value::Array(array), "[]=") => match arg(0) {
                Value::Int(i) if i >= 0 => {
                    let mut values = array.borrow_mut();
                    let i = i as usize;
                    if values.len() <= i {
                        values.resize(i + 1, Value::Nil);
                    }
                    values[i] = arg(1);
                    Ok(arg(1))
                }
                other => Err(Unwind::raise(format!("bad index {other:?}"))),
            },
            (Value::Array(array), "<<") | (Value::Array(array), "push") => {
                array.borrow_mut().push(arg(0));
                Ok(receiver.clone())
            }
            (Value::Array(array), "size") | (Value::Array(array), "length") => {
                Ok(Value::Int(array.borrow().len() as i64))
            }
            (Value::Array(array), "each") | (Value::Array(array), "map") => {
                let Some(block) = arguments.block.as_ref().and_then(|b| b.as_proc()) else {
                    return Err(Unwind::raise("no block given"));
                };
                let values = array.borrow().clone();
                let mut mapped = vec![];
                for value in values {
                    mapped.push(self.call_proc(block, CallArgs::positional(vec![value]))?);
                }
                if method.as_str() == "map" {
                    Ok(Value::array(mapped))
                } else {
                    Ok(receiver.clone())
                }
            }
            (Value::Hash(hash), "[]") => Ok(hash
                .borrow()
                .iter()
                .find(|(k, _)| *k == arg(0))
                .map(|(_, v)| v.clone())
                .unwrap_or(Value::Nil)),
            (Value::Hash(hash), "[]=") => {
                hash_store(&mut hash.borrow_mut(), arg(0), arg(1));
                Ok(arg(1))
            }
            (Value::Proc(proc_value), "call") => {
                let mut call = arguments.clone();
                call.block = None;
                self.call_proc(proc_value, call)
            }
            (_, "block_given?") => Ok(Value::Bool(arguments.block.is_some())),
            _ => Err(Unwind::raise(format!(
                "undefined method '{method}' for {receiver:?}"
            ))),
        }
    }
}

fn hash_store(pairs: &mut Vec<(Value, Value)>, key: Value, value: Value) {
    match pairs.iter_mut().find(|(k, _)| *k == key) {
        Some((_, existing)) => *existing = value,
        None => pairs.push((key, value)),
    }
}

fn index_from(values: &[Value], index: i64) -> Value {
    let position = if index < 0 {
        values.len() as i64 + index
    } else {
        index
    };
    if position < 0 {
        return Value::Nil;
    }
    values.get(position as usize).cloned().unwrap_or(Value::Nil)
}

fn describe(unwind: Unwind) -> String {
    match unwind {
        Unwind::Raise(message) => message,
        Unwind::Break(id, _) => format!("break from proc-closure ({id})"),
        Unwind::Next(_) => "unexpected next".to_string(),
        Unwind::Return(_, _) => "unexpected return".to_string(),
    }
}
