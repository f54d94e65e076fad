// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A small reference interpreter for compiled programs.
//!
//! It implements just enough of the VM to observe the behavior of the
//! generated code: registers start as `undefined`, environments are
//! hole-initialized and an exception transfers to the innermost catch
//! entry covering the throwing instruction. `print(...)` appends its
//! arguments to [`Vm::output`].

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use kestrel_codegen::ast::Program;
use kestrel_codegen::bytecode::{CompiledFunction, FunctionId, Opcode, Operand};
use kestrel_codegen::{CompileOptions, CompiledProgram, LiteralBuffer, LiteralValue, compile};

pub type ObjRef = Rc<RefCell<Object>>;
pub type EnvRef = Rc<RefCell<Env>>;

#[derive(Debug, Clone)]
pub enum Value {
    Undefined,
    Null,
    Hole,
    Bool(bool),
    Number(f64),
    Str(Rc<str>),
    Object(ObjRef),
    Env(Option<EnvRef>),
    Iter(Rc<RefCell<Iter>>),
}

#[derive(Debug)]
pub struct Iter {
    items: Vec<Value>,
    next: usize,
}

#[derive(Debug, Clone)]
pub enum Callable {
    Closure {
        function: FunctionId,
        env: Option<EnvRef>,
    },
    Print,
}

#[derive(Debug, Default)]
pub struct Object {
    props: Vec<(String, Value)>,
    proto: Option<ObjRef>,
    callable: Option<Callable>,
    is_array: bool,
}

impl Object {
    fn get_own(&self, key: &str) -> Option<Value> {
        self.props.iter().find(|(k, _)| k == key).map(|(_, v)| v.clone())
    }

    fn set(&mut self, key: &str, value: Value) {
        if let Some(entry) = self.props.iter_mut().find(|(k, _)| k == key) {
            entry.1 = value;
        } else {
            self.props.push((key.to_string(), value));
        }
        if self.is_array {
            if let Ok(index) = key.parse::<usize>() {
                let length = self.get_own("length").map(|v| number(&v) as usize).unwrap_or(0);
                if index >= length {
                    self.set("length", Value::Number((index + 1) as f64));
                }
            }
        }
    }
}

#[derive(Debug)]
pub struct Env {
    slots: Vec<Value>,
    parent: Option<EnvRef>,
}

pub type Completion = Result<Value, Value>;

fn new_object(object: Object) -> Value {
    Value::Object(Rc::new(RefCell::new(object)))
}

fn error(kind: &str, message: &str) -> Value {
    Value::Str(format!("{}: {}", kind, message).into())
}

pub fn number(value: &Value) -> f64 {
    match value {
        Value::Number(n) => *n,
        Value::Bool(true) => 1.0,
        Value::Bool(false) | Value::Null => 0.0,
        Value::Str(s) => s.trim().parse().unwrap_or(f64::NAN),
        _ => f64::NAN,
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Undefined | Value::Null | Value::Hole => false,
        Value::Bool(b) => *b,
        Value::Number(n) => *n != 0.0 && !n.is_nan(),
        Value::Str(s) => !s.is_empty(),
        _ => true,
    }
}

pub fn display(value: &Value) -> String {
    match value {
        Value::Undefined => "undefined".into(),
        Value::Null => "null".into(),
        Value::Hole => "<hole>".into(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) if n.fract() == 0.0 && n.is_finite() => format!("{}", *n as i64),
        Value::Number(n) => n.to_string(),
        Value::Str(s) => s.to_string(),
        Value::Object(o) if o.borrow().callable.is_some() => "[function]".into(),
        Value::Object(_) => "[object]".into(),
        Value::Env(_) => "<env>".into(),
        Value::Iter(_) => "<iterator>".into(),
    }
}

fn strict_equals(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Number(x), Value::Number(y)) => x == y,
        (Value::Str(x), Value::Str(y)) => x == y,
        (Value::Object(x), Value::Object(y)) => Rc::ptr_eq(x, y),
        _ => false,
    }
}

fn loose_equals(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Undefined | Value::Null, Value::Undefined | Value::Null) => true,
        (Value::Number(_), Value::Str(_)) | (Value::Str(_), Value::Number(_)) => number(a) == number(b),
        _ => strict_equals(a, b),
    }
}

fn key_of(value: &Value) -> String {
    display(value)
}

fn type_of(value: &Value) -> &'static str {
    match value {
        Value::Undefined => "undefined",
        Value::Null => "object",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::Str(_) => "string",
        Value::Object(o) if o.borrow().callable.is_some() => "function",
        _ => "object",
    }
}

/// Runs compiled programs against fresh global state.
pub struct Vm<'p> {
    program: &'p CompiledProgram,
    globals: HashMap<String, Value>,
    lexical: HashMap<String, (Value, bool)>,
    pub output: Vec<String>,
    pub closed_iterators: usize,
    /// Makes every iterator close throw, like a `return()` that fails
    pub failing_close: bool,
    steps: usize,
}

impl<'p> Vm<'p> {
    pub fn new(program: &'p CompiledProgram) -> Self {
        let mut globals = HashMap::new();
        globals.insert(
            "print".to_string(),
            new_object(Object {
                callable: Some(Callable::Print),
                ..Object::default()
            }),
        );
        Self {
            program,
            globals,
            lexical: HashMap::new(),
            output: Vec::new(),
            closed_iterators: 0,
            failing_close: false,
            steps: 0,
        }
    }

    pub fn run(&mut self) -> Completion {
        self.invoke(FunctionId::new(0), None, Value::Undefined, Vec::new(), Value::Undefined)
    }

    fn string(&self, operand: &Operand) -> String {
        match operand {
            Operand::Str(id) => self.program.string(*id).unwrap_or_default().to_string(),
            other => panic!("expected string operand, got {}", other),
        }
    }

    fn literal_value(&self, value: &LiteralValue) -> Value {
        match value {
            LiteralValue::Undefined => Value::Undefined,
            LiteralValue::Null => Value::Null,
            LiteralValue::Boolean(b) => Value::Bool(*b),
            LiteralValue::Number(n) => Value::Number(*n),
            LiteralValue::String(id) => Value::Str(self.program.string(*id).unwrap_or_default().into()),
        }
    }

    fn get(&self, object: &Value, key: &str) -> Completion {
        match object {
            Value::Object(o) => {
                let mut current = Some(o.clone());
                while let Some(obj) = current {
                    if let Some(value) = obj.borrow().get_own(key) {
                        return Ok(value);
                    }
                    current = obj.borrow().proto.clone();
                }
                Ok(Value::Undefined)
            }
            Value::Str(s) if key == "length" => Ok(Value::Number(s.chars().count() as f64)),
            Value::Undefined | Value::Null => Err(error("TypeError", &format!("cannot read '{}'", key))),
            _ => Ok(Value::Undefined),
        }
    }

    fn set(&self, object: &Value, key: &str, value: Value) -> Completion {
        match object {
            Value::Object(o) => {
                o.borrow_mut().set(key, value);
                Ok(Value::Undefined)
            }
            _ => Err(error("TypeError", &format!("cannot set '{}'", key))),
        }
    }

    fn callable(&self, callee: &Value) -> Result<Callable, Value> {
        match callee {
            Value::Object(o) => o
                .borrow()
                .callable
                .clone()
                .ok_or_else(|| error("TypeError", "not a function")),
            _ => Err(error("TypeError", "not a function")),
        }
    }

    fn call(&mut self, callee: Value, this: Value, args: Vec<Value>) -> Completion {
        match self.callable(&callee)? {
            Callable::Print => {
                let line: Vec<String> = args.iter().map(display).collect();
                self.output.push(line.join(" "));
                Ok(Value::Undefined)
            }
            Callable::Closure { function, env } => self.invoke(function, env, this, args, callee),
        }
    }

    fn closure(&self, function: FunctionId, env: &Option<EnvRef>) -> Value {
        new_object(Object {
            callable: Some(Callable::Closure {
                function,
                env: env.clone(),
            }),
            ..Object::default()
        })
    }

    fn lookup_global(&self, name: &str) -> Option<Completion> {
        if let Some((value, _)) = self.lexical.get(name) {
            if matches!(value, Value::Hole) {
                return Some(Err(error("ReferenceError", name)));
            }
            return Some(Ok(value.clone()));
        }
        self.globals.get(name).map(|v| Ok(v.clone()))
    }

    fn env_at(env: &Option<EnvRef>, level: i64) -> EnvRef {
        let mut current = env.clone().expect("no lexical environment");
        for _ in 0..level {
            let parent = current.borrow().parent.clone().expect("environment level out of range");
            current = parent;
        }
        current
    }

    fn invoke(
        &mut self,
        id: FunctionId,
        closure_env: Option<EnvRef>,
        this: Value,
        args: Vec<Value>,
        callee: Value,
    ) -> Completion {
        let program = self.program;
        let function: &CompiledFunction = &program.functions[id.index()];
        let mut regs = vec![Value::Undefined; function.register_count as usize];
        for (i, arg) in args.into_iter().take(function.param_count as usize).enumerate() {
            regs[i] = arg;
        }
        let mut env = closure_env;
        let mut acc = Value::Undefined;
        let mut pc = 0usize;

        loop {
            self.steps += 1;
            assert!(self.steps < 1_000_000, "step limit exceeded");
            let instruction = &function.instructions[pc];
            let ops = instruction.operands();
            let reg = |i: usize| match ops[i] {
                Operand::Reg(r) => r.index(),
                ref other => panic!("expected register, got {}", other),
            };
            let imm = |i: usize| match ops[i] {
                Operand::Imm(v) => v,
                ref other => panic!("expected immediate, got {}", other),
            };
            let mut next = pc + 1;

            let step: Result<(), Value> = (|| {
                match instruction.opcode() {
                    Opcode::Nop | Opcode::Debugger => {}
                    Opcode::LdUndefined => acc = Value::Undefined,
                    Opcode::LdNull => acc = Value::Null,
                    Opcode::LdTrue => acc = Value::Bool(true),
                    Opcode::LdFalse => acc = Value::Bool(false),
                    Opcode::LdHole => acc = Value::Hole,
                    Opcode::LdThis => acc = this.clone(),
                    Opcode::LdFunction => acc = callee.clone(),
                    Opcode::Ldai => acc = Value::Number(imm(0) as f64),
                    Opcode::Fldai => match ops[0] {
                        Operand::Num(n) => acc = Value::Number(n),
                        _ => unreachable!(),
                    },
                    Opcode::LdaStr | Opcode::LdBigInt => acc = Value::Str(self.string(&ops[0]).into()),
                    Opcode::Lda => acc = regs[reg(0)].clone(),
                    Opcode::Sta => regs[reg(0)] = acc.clone(),
                    Opcode::Mov => regs[reg(0)] = regs[reg(1)].clone(),

                    Opcode::Add2 => {
                        let lhs = &regs[reg(0)];
                        acc = match (lhs, &acc) {
                            (Value::Str(_), _) | (_, Value::Str(_)) => {
                                Value::Str(format!("{}{}", display(lhs), display(&acc)).into())
                            }
                            _ => Value::Number(number(lhs) + number(&acc)),
                        };
                    }
                    Opcode::Sub2 => acc = Value::Number(number(&regs[reg(0)]) - number(&acc)),
                    Opcode::Mul2 => acc = Value::Number(number(&regs[reg(0)]) * number(&acc)),
                    Opcode::Div2 => acc = Value::Number(number(&regs[reg(0)]) / number(&acc)),
                    Opcode::Mod2 => acc = Value::Number(number(&regs[reg(0)]) % number(&acc)),
                    Opcode::Less => acc = Value::Bool(number(&regs[reg(0)]) < number(&acc)),
                    Opcode::LessEq => acc = Value::Bool(number(&regs[reg(0)]) <= number(&acc)),
                    Opcode::Greater => acc = Value::Bool(number(&regs[reg(0)]) > number(&acc)),
                    Opcode::GreaterEq => acc = Value::Bool(number(&regs[reg(0)]) >= number(&acc)),
                    Opcode::StrictEq => acc = Value::Bool(strict_equals(&regs[reg(0)], &acc)),
                    Opcode::StrictNotEq => acc = Value::Bool(!strict_equals(&regs[reg(0)], &acc)),
                    Opcode::Eq => acc = Value::Bool(loose_equals(&regs[reg(0)], &acc)),
                    Opcode::NotEq => acc = Value::Bool(!loose_equals(&regs[reg(0)], &acc)),

                    Opcode::Neg => acc = Value::Number(-number(&acc)),
                    Opcode::Inc => acc = Value::Number(number(&acc) + 1.0),
                    Opcode::Dec => acc = Value::Number(number(&acc) - 1.0),
                    Opcode::ToNumber | Opcode::ToNumeric => acc = Value::Number(number(&acc)),
                    Opcode::IsTrue => acc = Value::Bool(truthy(&acc)),
                    Opcode::IsFalse => acc = Value::Bool(!truthy(&acc)),
                    Opcode::TypeOf => acc = Value::Str(type_of(&acc).into()),

                    Opcode::Jmp => next = jump(function, pc),
                    Opcode::Jeqz => {
                        if matches!(acc, Value::Bool(false)) {
                            next = jump(function, pc);
                        }
                    }
                    Opcode::Jnez => {
                        if matches!(acc, Value::Bool(true)) {
                            next = jump(function, pc);
                        }
                    }
                    Opcode::JstrictEqUndefined => {
                        if matches!(acc, Value::Undefined) {
                            next = jump(function, pc);
                        }
                    }

                    Opcode::CreateEmptyObject => acc = new_object(Object::default()),
                    Opcode::CreateEmptyArray => {
                        let mut array = Object {
                            is_array: true,
                            ..Object::default()
                        };
                        array.set("length", Value::Number(0.0));
                        acc = new_object(array);
                    }
                    Opcode::CreateArrayWithBuffer | Opcode::CreateObjectWithBuffer => {
                        let Operand::Literal(id) = ops[0] else { unreachable!() };
                        let mut object = Object::default();
                        match program.literal(id).expect("literal buffer") {
                            LiteralBuffer::Array(values) => {
                                object.is_array = true;
                                object.set("length", Value::Number(0.0));
                                for (i, value) in values.iter().enumerate() {
                                    object.set(&i.to_string(), self.literal_value(value));
                                }
                            }
                            LiteralBuffer::Object(entries) => {
                                for (key, value) in entries {
                                    let key = program.string(*key).unwrap_or_default();
                                    object.set(key, self.literal_value(value));
                                }
                            }
                        }
                        acc = new_object(object);
                    }
                    Opcode::LdObjByName => {
                        let key = self.string(&ops[0]);
                        acc = self.get(&regs[reg(1)], &key)?;
                    }
                    Opcode::StObjByName | Opcode::StOwnByName => {
                        let key = self.string(&ops[0]);
                        self.set(&regs[reg(1)], &key, acc.clone())?;
                    }
                    Opcode::LdObjByValue => {
                        let key = key_of(&acc);
                        acc = self.get(&regs[reg(0)], &key)?;
                    }
                    Opcode::StObjByValue | Opcode::StOwnByValue => {
                        let key = key_of(&regs[reg(1)]);
                        self.set(&regs[reg(0)], &key, acc.clone())?;
                    }
                    Opcode::StOwnByIndex => {
                        let key = imm(1).to_string();
                        self.set(&regs[reg(0)], &key, acc.clone())?;
                    }
                    Opcode::DelObjProp => {
                        let key = key_of(&acc);
                        if let Value::Object(o) = &regs[reg(0)] {
                            o.borrow_mut().props.retain(|(k, _)| *k != key);
                        }
                        acc = Value::Bool(true);
                    }

                    Opcode::TryLdGlobalByName => {
                        let name = self.string(&ops[0]);
                        acc = match self.lookup_global(&name) {
                            Some(result) => result?,
                            None => return Err(error("ReferenceError", &name)),
                        };
                    }
                    Opcode::TryStGlobalByName => {
                        let name = self.string(&ops[0]);
                        if let Some((value, is_const)) = self.lexical.get_mut(&name) {
                            if matches!(value, Value::Hole) {
                                return Err(error("ReferenceError", &name));
                            }
                            if *is_const {
                                return Err(error("TypeError", &name));
                            }
                            *value = acc.clone();
                        } else if self.globals.contains_key(&name) {
                            self.globals.insert(name, acc.clone());
                        } else {
                            return Err(error("ReferenceError", &name));
                        }
                    }
                    Opcode::LdGlobalVar => {
                        let name = self.string(&ops[0]);
                        acc = self.globals.get(&name).cloned().unwrap_or(Value::Undefined);
                    }
                    Opcode::StGlobalVar => {
                        let name = self.string(&ops[0]);
                        self.globals.insert(name, acc.clone());
                    }
                    Opcode::StToGlobalRecord | Opcode::StConstToGlobalRecord => {
                        let name = self.string(&ops[0]);
                        let is_const = instruction.opcode() == Opcode::StConstToGlobalRecord;
                        self.lexical.insert(name, (acc.clone(), is_const));
                    }

                    Opcode::NewLexEnv | Opcode::WideNewLexEnv => {
                        env = Some(Rc::new(RefCell::new(Env {
                            slots: vec![Value::Hole; imm(0) as usize],
                            parent: env.take(),
                        })));
                    }
                    Opcode::PopLexEnv => {
                        let parent = env.as_ref().expect("pop without environment").borrow().parent.clone();
                        env = parent;
                    }
                    Opcode::LdLexVar | Opcode::WideLdLexVar => {
                        let target = Self::env_at(&env, imm(0));
                        acc = target.borrow().slots[imm(1) as usize].clone();
                    }
                    Opcode::StLexVar | Opcode::WideStLexVar => {
                        let target = Self::env_at(&env, imm(0));
                        target.borrow_mut().slots[imm(1) as usize] = acc.clone();
                    }
                    Opcode::SaveLexEnv => regs[reg(0)] = Value::Env(env.clone()),
                    Opcode::RestoreLexEnv => match &regs[reg(0)] {
                        Value::Env(saved) => env = saved.clone(),
                        other => panic!("restorelexenv from {:?}", other),
                    },
                    Opcode::ThrowUndefinedIfHole => {
                        if matches!(acc, Value::Hole) {
                            return Err(error("ReferenceError", &self.string(&ops[0])));
                        }
                    }
                    Opcode::ThrowConstAssignment => {
                        return Err(error("TypeError", &self.string(&ops[0])));
                    }

                    Opcode::CallRange | Opcode::WideCallRange => {
                        let (argc, first) = (imm(0) as usize, reg(1));
                        let args = if argc == 0 { Vec::new() } else { regs[first..first + argc].to_vec() };
                        acc = self.call(acc.clone(), Value::Undefined, args)?;
                    }
                    Opcode::CallThisRange | Opcode::WideCallThisRange => {
                        let (argc, first) = (imm(0) as usize, reg(1));
                        let receiver = regs[first].clone();
                        let args = regs[first + 1..first + 1 + argc].to_vec();
                        acc = self.call(acc.clone(), receiver, args)?;
                    }
                    Opcode::NewObjRange | Opcode::WideNewObjRange => {
                        let (argc, first) = (imm(0) as usize, reg(1));
                        let constructor = regs[first].clone();
                        let args = regs[first + 1..first + 1 + argc].to_vec();
                        let proto = match self.get(&constructor, "prototype")? {
                            Value::Object(p) => Some(p),
                            _ => None,
                        };
                        let instance = new_object(Object {
                            proto,
                            ..Object::default()
                        });
                        let result = self.call(constructor, instance.clone(), args)?;
                        acc = match result {
                            Value::Object(_) => result,
                            _ => instance,
                        };
                    }

                    Opcode::DefineFunc => {
                        let Operand::Func(id) = ops[0] else { unreachable!() };
                        acc = self.closure(id, &env);
                    }
                    Opcode::DefineClass => {
                        let Operand::Func(id) = ops[0] else { unreachable!() };
                        let constructor = self.closure(id, &env);
                        self.set(&constructor, "prototype", new_object(Object::default()))?;
                        acc = constructor;
                    }

                    Opcode::GetPropIterator => {
                        let keys = match &acc {
                            Value::Object(o) => o
                                .borrow()
                                .props
                                .iter()
                                .filter(|(k, _)| k != "length")
                                .map(|(k, _)| Value::Str(k.as_str().into()))
                                .collect(),
                            _ => Vec::new(),
                        };
                        acc = Value::Iter(Rc::new(RefCell::new(Iter { items: keys, next: 0 })));
                    }
                    Opcode::GetNextPropName => {
                        let Value::Iter(iter) = &regs[reg(0)] else { panic!("not an iterator") };
                        let mut iter = iter.borrow_mut();
                        acc = iter.items.get(iter.next).cloned().unwrap_or(Value::Undefined);
                        iter.next += 1;
                    }
                    Opcode::GetIterator => {
                        let length = number(&self.get(&acc, "length")?) as usize;
                        let mut items = Vec::with_capacity(length);
                        for i in 0..length {
                            items.push(self.get(&acc, &i.to_string())?);
                        }
                        acc = Value::Iter(Rc::new(RefCell::new(Iter { items, next: 0 })));
                    }
                    Opcode::IteratorNext => {
                        let Value::Iter(iter) = &regs[reg(0)] else { panic!("not an iterator") };
                        let mut iter = iter.borrow_mut();
                        let mut result = Object::default();
                        match iter.items.get(iter.next).cloned() {
                            Some(value) => {
                                result.set("done", Value::Bool(false));
                                result.set("value", value);
                            }
                            None => {
                                result.set("done", Value::Bool(true));
                                result.set("value", Value::Undefined);
                            }
                        }
                        iter.next += 1;
                        acc = new_object(result);
                    }
                    Opcode::CloseIterator => {
                        self.closed_iterators += 1;
                        if self.failing_close {
                            return Err(error("TypeError", "iterator close failed"));
                        }
                    }

                    Opcode::Return | Opcode::ReturnUndefined | Opcode::Throw => {}
                    other => panic!("opcode `{}` is not supported by the test interpreter", other.mnemonic()),
                }
                Ok(())
            })();

            let thrown = match (step, instruction.opcode()) {
                (Err(exception), _) => exception,
                (Ok(()), Opcode::Return) => return Ok(acc),
                (Ok(()), Opcode::ReturnUndefined) => return Ok(Value::Undefined),
                (Ok(()), Opcode::Throw) => acc.clone(),
                (Ok(()), _) => {
                    pc = next;
                    continue;
                }
            };

            match function.handler_for(pc as u32) {
                Some(entry) => {
                    acc = thrown;
                    pc = entry.handler as usize;
                }
                None => return Err(thrown),
            }
        }
    }
}

fn jump(function: &CompiledFunction, pc: usize) -> usize {
    function.jump_target(pc).expect("jump without target") as usize
}

/// Compiles and runs a program, returning what it printed.
pub fn run(program: &Program) -> Result<Vec<String>, String> {
    let compiled = compile(program, CompileOptions::default()).map_err(|e| e.to_string())?;
    let mut vm = Vm::new(&compiled);
    match vm.run() {
        Ok(_) => Ok(vm.output),
        Err(exception) => Err(display(&exception)),
    }
}

/// Like [`run`], but also returns output printed before an uncaught throw.
pub fn run_to_completion(program: &Program) -> (Vec<String>, Option<String>) {
    let compiled = match compile(program, CompileOptions::default()) {
        Ok(compiled) => compiled,
        Err(failure) => return (Vec::new(), Some(failure.to_string())),
    };
    let mut vm = Vm::new(&compiled);
    let outcome = vm.run();
    (vm.output, outcome.err().map(|e| display(&e)))
}
