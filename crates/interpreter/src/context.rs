use crate::{bytecode::CompiledUnit, value::Value, vm::ErrorKind};
use std::{cell::RefCell, fmt, rc::Rc};

/// The variables of one activation of a method or block.
///
/// Environments are reference counted as a block keeps the environment it was created
/// in alive after the activation has returned.
pub struct Environment {
  /// Arguments followed by locals
  pub locals: RefCell<Vec<Value>>,
  /// The receiver of the method
  pub receiver: Value,
  /// The lexically enclosing environment, only for blocks
  pub parent: Option<Rc<Environment>>,
  /// The environment of the enclosing method, only for blocks
  pub home: Option<Rc<Environment>>,
}
impl Environment {
  /// The environment for a method activation
  #[must_use]
  pub fn method(receiver: Value, locals: Vec<Value>) -> Self {
    Self {
      locals: RefCell::new(locals),
      receiver,
      parent: None,
      home: None,
    }
  }

  /// The environment for a block activation
  #[must_use]
  pub fn block(
    receiver: Value,
    locals: Vec<Value>,
    parent: Rc<Environment>,
    home: Rc<Environment>,
  ) -> Self {
    Self {
      locals: RefCell::new(locals),
      receiver,
      parent: Some(parent),
      home: Some(home),
    }
  }

  /// Is it the environment of a block activation?
  #[must_use]
  pub fn is_block(&self) -> bool {
    self.home.is_some()
  }

  /// The environment of the enclosing method, which is itself for methods
  #[must_use]
  pub fn home(self: &Rc<Self>) -> Rc<Environment> {
    match &self.home {
      Some(home) => home.clone(),
      None => self.clone(),
    }
  }

  /// Walk `depth` lexical parents up the chain
  fn ancestor(self: &Rc<Self>, depth: u16) -> Result<Rc<Environment>, ErrorKind> {
    let mut environment = self.clone();
    for _ in 0..depth {
      let parent = environment.parent.clone();
      environment = parent.ok_or(ErrorKind::Internal("local variable depth out of range"))?;
    }
    Ok(environment)
  }

  /// Read a local, `depth` environments up the lexical chain
  pub(crate) fn get(self: &Rc<Self>, depth: u16, index: u16) -> Result<Value, ErrorKind> {
    let environment = self.ancestor(depth)?;
    let locals = environment.locals.borrow();
    (locals.get(usize::from(index)).cloned())
      .ok_or(ErrorKind::Internal("local variable index out of range"))
  }

  /// Write a local, `depth` environments up the lexical chain
  pub(crate) fn set(self: &Rc<Self>, depth: u16, index: u16, value: Value) -> Result<(), ErrorKind> {
    let environment = self.ancestor(depth)?;
    let mut locals = environment.locals.borrow_mut();
    let slot = (locals.get_mut(usize::from(index)))
      .ok_or(ErrorKind::Internal("local variable index out of range"))?;
    *slot = value;
    Ok(())
  }
}
impl fmt::Debug for Environment {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Environment")
      .field("locals", &self.locals)
      .field("receiver", &self.receiver)
      .field("is_block", &self.is_block())
      .finish_non_exhaustive()
  }
}

/// A source location recorded by a `Debug` instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
  pub(crate) file: u16,
  pub(crate) line: u16,
  pub(crate) column: u16,
}

/// An activation of a method or block on the call stack
#[derive(Debug)]
pub struct Frame {
  pub(crate) unit: Rc<CompiledUnit>,
  /// The method the unit is part of, which holds the table of blocks
  pub(crate) method: Rc<CompiledUnit>,
  pub(crate) ip: usize,
  pub(crate) stack: Vec<Value>,
  pub(crate) environment: Rc<Environment>,
  pub(crate) location: Option<Location>,
}
impl Frame {
  pub(crate) fn new(
    unit: Rc<CompiledUnit>,
    method: Rc<CompiledUnit>,
    environment: Rc<Environment>,
  ) -> Self {
    Self {
      unit,
      method,
      ip: 0,
      stack: Vec::with_capacity(8),
      environment,
      location: None,
    }
  }

  pub(crate) fn push(&mut self, value: Value) {
    self.stack.push(value);
  }

  pub(crate) fn pop(&mut self) -> Result<Value, ErrorKind> {
    self.stack.pop().ok_or(ErrorKind::StackUnderflow)
  }

  /// Pop `count` values, in the order they were pushed
  pub(crate) fn pop_many(&mut self, count: usize) -> Result<Vec<Value>, ErrorKind> {
    let start = (self.stack.len())
      .checked_sub(count)
      .ok_or(ErrorKind::StackUnderflow)?;
    Ok(self.stack.split_off(start))
  }

  pub(crate) fn receiver(&self) -> &Value {
    &self.environment.receiver
  }
}
