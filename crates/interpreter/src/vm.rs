use crate::{
  bytecode::{CompiledUnit, OpCode},
  collections::HashMap,
  context::{Environment, Frame, Location},
  define::MAIN_METHOD,
  object::{ClassTable, MetaClass},
  primitives::{Outcome, Primitive},
  value::{BlockDescriptor, Instance, Value},
};
use smartstring::alias::String as SmartString;
use std::{error, fmt, io, rc::Rc};

/// A virtual machine to execute compiled bytecode
pub struct VM<W: io::Write = io::Stdout> {
  classes: ClassTable,
  globals: HashMap<SmartString, Value>,
  frames: Vec<Frame>,
  loops: Vec<Loop>,
  output: W,
}

/// A `whileTrue:` or `whileFalse:` in progress
///
/// The condition and body blocks run one at a time in the frame above `depth`, and
/// the loop picks up again whenever that frame returns.
struct Loop {
  depth: usize,
  condition: Rc<BlockDescriptor>,
  body: Rc<BlockDescriptor>,
  repeat_while: bool,
  in_body: bool,
}

impl VM {
  /// Create a new VM, writing output to stdout
  #[must_use]
  pub fn new(classes: ClassTable) -> Self {
    Self::with_output(classes, io::stdout())
  }
}
impl<W: io::Write> VM<W> {
  /// Create a new VM, writing output from `Transcript show:` to the given writer
  pub fn with_output(classes: ClassTable, output: W) -> Self {
    let mut globals = HashMap::default();
    for class in classes.iter() {
      globals.insert(class.name.clone(), Value::Class(class.clone()));
    }
    if let Some(transcript) = classes.get("TranscriptStream") {
      let transcript = Instance::new(transcript.clone());
      globals.insert("Transcript".into(), Value::Object(Rc::new(transcript)));
    }

    Self {
      classes,
      globals,
      frames: Vec::with_capacity(16),
      loops: Vec::new(),
      output,
    }
  }

  /// The writer which output is sent to
  pub fn output(&self) -> &W {
    &self.output
  }

  /// The classes the VM is running with
  pub fn classes(&self) -> &ClassTable {
    &self.classes
  }

  /// Run the `main` method of a new instance of the entry class.
  ///
  /// If the entry class or its `main` method doesn't exist, there is nothing to run
  /// and `nil` is returned.
  ///
  /// # Errors
  /// Returns an error if a runtime error is encountered in the bytecode being executed
  pub fn run(&mut self, entry: &str) -> Result<Value, RuntimeError> {
    let Some(class) = self.classes.get(entry).cloned() else {
      log::debug!("no class {entry}, nothing to run");
      return Ok(Value::Nil);
    };
    let Some(method) = class.lookup(MAIN_METHOD, false) else {
      log::debug!("no method {entry}>>{MAIN_METHOD}, nothing to run");
      return Ok(Value::Nil);
    };

    log::debug!("running {}", method.name);
    let receiver = Value::Object(Rc::new(Instance::new(class)));
    let environment = Environment::method(receiver, vec![Value::Nil; method.slot_count()]);
    self.frames.clear();
    self.loops.clear();
    self.frames.push(Frame::new(method.clone(), method, Rc::new(environment)));

    match self.execute() {
      Ok(value) => {
        log::debug!("finished running {entry}, result: {value:?}");
        Ok(value)
      }
      Err(kind) => {
        let traceback = (self.frames.iter().rev())
          .map(TraceLocation::from_frame)
          .collect();
        self.frames.clear();
        self.loops.clear();

        Err(RuntimeError { kind, traceback })
      }
    }
  }

  fn frame(&mut self) -> Result<&mut Frame, ErrorKind> {
    self.frames.last_mut().ok_or(ErrorKind::Internal("no active context"))
  }

  fn push(&mut self, value: Value) -> Result<(), ErrorKind> {
    self.frame()?.push(value);
    Ok(())
  }

  fn pop(&mut self) -> Result<Value, ErrorKind> {
    self.frame()?.pop()
  }

  #[allow(clippy::too_many_lines)]
  fn execute(&mut self) -> Result<Value, ErrorKind> {
    loop {
      let frame = self.frame()?;
      let unit = frame.unit.clone();
      let ip = frame.ip;
      let opcode = unit.opcode(ip).ok_or(ErrorKind::Internal("unknown opcode"))?;
      frame.ip += opcode.length();

      match opcode {
        // Stack literals
        OpCode::Nil => self.push(Value::Nil)?,
        OpCode::True => self.push(Value::Boolean(true))?,
        OpCode::False => self.push(Value::Boolean(false))?,
        OpCode::SelfRef => {
          let frame = self.frame()?;
          let receiver = frame.receiver().clone();
          frame.push(receiver);
        }
        OpCode::PushInteger => self.push(Value::Integer(unit.read_u32(ip + 1).cast_signed()))?,
        OpCode::PushFloat => self.push(Value::Float(f32::from_bits(unit.read_u32(ip + 1))))?,
        OpCode::PushCharacter => {
          let character = char::from_u32(unit.read_u32(ip + 1))
            .ok_or(ErrorKind::Internal("invalid character literal"))?;
          self.push(Value::Character(character))?;
        }
        OpCode::PushArray => {
          let count = usize::from(unit.read_u16(ip + 1));
          let frame = self.frame()?;
          let items = frame.pop_many(count)?;
          frame.push(Value::from(items));
        }
        OpCode::PushLiteral => {
          let literal = literal(&unit, unit.read_u16(ip + 1))?;
          self.push(Value::String(literal))?;
        }

        // Storage access
        OpCode::PushGlobal => {
          let name = literal(&unit, unit.read_u16(ip + 1))?;
          let value = self.global(&name)?;
          self.push(value)?;
        }
        OpCode::PushLocal => {
          let frame = self.frame()?;
          let value = (frame.environment).get(unit.read_u16(ip + 1), unit.read_u16(ip + 3))?;
          frame.push(value);
        }
        OpCode::PushField => {
          let frame = self.frame()?;
          let index = unit.read_u16(ip + 1);
          let value = field(frame.receiver(), index, |fields, index| fields.get(index).cloned())?;
          frame.push(value);
        }
        OpCode::StoreLocal => {
          let frame = self.frame()?;
          let value = frame.stack.last().cloned().ok_or(ErrorKind::StackUnderflow)?;
          (frame.environment).set(unit.read_u16(ip + 1), unit.read_u16(ip + 3), value)?;
        }
        OpCode::StoreField => {
          let frame = self.frame()?;
          let value = frame.stack.last().cloned().ok_or(ErrorKind::StackUnderflow)?;
          let index = unit.read_u16(ip + 1);
          field(frame.receiver(), index, |fields, index| {
            fields.get_mut(index).map(|slot| *slot = value)
          })?;
        }
        OpCode::Pop => {
          self.pop()?;
        }

        // Message sends
        OpCode::Send | OpCode::SendSuper => {
          let arguments = usize::from(unit.read_u16(ip + 1));
          let selector = literal(&unit, unit.read_u16(ip + 3))?;
          let is_super = opcode == OpCode::SendSuper;
          self.send(&unit, &selector, arguments, is_super)?;
        }

        // Control
        OpCode::Block => {
          let frame = self.frame()?;
          let index = usize::from(unit.read_u16(ip + 1));
          let block_unit = (frame.method.blocks.get(index).cloned())
            .ok_or(ErrorKind::Internal("block index out of range"))?;

          let block = BlockDescriptor {
            unit: block_unit,
            method: frame.method.clone(),
            environment: frame.environment.clone(),
            home: frame.environment.home(),
            receiver: frame.receiver().clone(),
          };
          frame.push(Value::Block(Rc::new(block)));
        }
        OpCode::BlockReturn => {
          let value = self.pop()?;
          let position = self.frames.len().saturating_sub(1);
          if let Some(value) = self.return_to(position, value)? {
            return Ok(value);
          }
        }
        OpCode::Return => {
          let value = self.pop()?;
          let frame = self.frame()?;

          let home_frame = if frame.environment.is_block() {
            self.home_frame()?
          } else {
            self.frames.len().saturating_sub(1)
          };

          if let Some(value) = self.return_to(home_frame, value)? {
            return Ok(value);
          }
        }
        OpCode::Debug => {
          self.frame()?.location = Some(Location {
            file: unit.read_u16(ip + 1),
            line: unit.read_u16(ip + 3),
            column: unit.read_u16(ip + 5),
          });
        }
      }
    }
  }

  /// Unwind the frames from the top down to and including `position`, giving the value
  /// to the frame below. Returns the value if there is no frame left to give it to.
  fn return_to(&mut self, position: usize, value: Value) -> Result<Option<Value>, ErrorKind> {
    for frame in self.frames.drain(position..).rev() {
      log::trace!("leaving {}", frame.unit.name);
    }

    let depth = self.frames.len();
    let running = self.loops.partition_point(|running| running.depth < depth);
    self.loops.truncate(running);
    if self.loops.last().is_some_and(|running| running.depth + 1 == depth) {
      self.continue_loop(value)?;
      return Ok(None);
    }

    match self.frames.last_mut() {
      Some(frame) => {
        frame.push(value);
        Ok(None)
      }
      None => Ok(Some(value)),
    }
  }

  /// Take the result of the condition or body block of the innermost loop, and start
  /// the next block it needs. When the loop is done, `nil` is given to its caller.
  fn continue_loop(&mut self, value: Value) -> Result<(), ErrorKind> {
    let running = (self.loops.last_mut()).ok_or(ErrorKind::Internal("no active loop"))?;

    let next = if running.in_body {
      running.in_body = false;
      running.condition.clone()
    } else {
      match value {
        Value::Boolean(result) if result == running.repeat_while => {
          running.in_body = true;
          running.body.clone()
        }
        Value::Boolean(_) => {
          self.loops.pop();
          return self.push(Value::Nil);
        }
        other => {
          return Err(ErrorKind::TypeError {
            expected: "Boolean",
            got: other.class_name().to_owned(),
          });
        }
      }
    };

    self.invoke_block(&next, Vec::new())
  }

  /// Find the frame of the method a block is lexically inside of, for a return from the
  /// method inside of the block
  ///
  /// The home environment is only on the stack while its method is running, so a
  /// block whose method has returned finds nothing.
  fn home_frame(&mut self) -> Result<usize, ErrorKind> {
    let frame = self.frame()?;
    let home = frame.environment.home();
    let block = frame.unit.name.to_string();

    (self.frames.iter())
      .rposition(|frame| Rc::ptr_eq(&frame.environment, &home))
      .ok_or(ErrorKind::BlockCannotReturn { block })
  }

  fn global(&self, name: &str) -> Result<Value, ErrorKind> {
    if let Some(value) = self.globals.get(name) {
      return Ok(value.clone());
    }

    if name.starts_with(char::is_uppercase) {
      Err(ErrorKind::UnknownClass(name.to_owned()))
    } else {
      Err(ErrorKind::UndefinedGlobal(name.to_owned()))
    }
  }

  /// The runtime class of a value
  fn class_of(&self, value: &Value) -> Option<Rc<MetaClass>> {
    match value {
      Value::Object(instance) => Some(instance.class.clone()),
      Value::Class(class) => Some(class.clone()),
      other => self.classes.get(other.class_name()).cloned(),
    }
  }

  fn send(
    &mut self,
    unit: &CompiledUnit,
    selector: &str,
    argument_count: usize,
    is_super: bool,
  ) -> Result<(), ErrorKind> {
    let frame = self.frame()?;
    let arguments = frame.pop_many(argument_count)?;
    let receiver = frame.pop()?;

    if !is_super {
      if let Some(primitive) = receiver.builtin(selector, argument_count) {
        return self.primitive(primitive, receiver, arguments);
      }
    }

    let class_side = receiver.is_class();
    let method = if is_super {
      let superclass = (self.classes.get(&unit.class_name))
        .and_then(|class| class.superclass.clone());
      let lookup = |side| superclass.as_ref().and_then(|class| class.lookup(selector, side));
      (lookup(class_side)).ok_or_else(|| missing_method(&receiver, selector, lookup(!class_side)))?
    } else {
      let class = self.class_of(&receiver);
      let lookup = |side| self.classes.find_method(class.as_deref(), selector, side);
      (lookup(class_side)).ok_or_else(|| missing_method(&receiver, selector, lookup(!class_side)))?
    };

    self.invoke(method, receiver, arguments)
  }

  fn invoke(
    &mut self,
    method: Rc<CompiledUnit>,
    receiver: Value,
    arguments: Vec<Value>,
  ) -> Result<(), ErrorKind> {
    if let Some(primitive) = method.primitive {
      return self.primitive(primitive, receiver, arguments);
    }

    if arguments.len() != usize::from(method.argument_count) {
      return Err(ErrorKind::Internal("wrong number of arguments for method"));
    }

    log::trace!("entering {}", method.name);
    let locals = slots(arguments, &method);
    let environment = Environment::method(receiver, locals);
    self.frames.push(Frame::new(method.clone(), method, Rc::new(environment)));
    Ok(())
  }

  fn invoke_block(
    &mut self,
    block: &BlockDescriptor,
    arguments: Vec<Value>,
  ) -> Result<(), ErrorKind> {
    if arguments.len() != block.argument_count() {
      return Err(ErrorKind::MismatchedBlockArguments {
        expected: block.argument_count(),
        got: arguments.len(),
      });
    }

    log::trace!("entering {}", block.unit.name);
    let locals = slots(arguments, &block.unit);
    let environment = Environment::block(
      block.receiver.clone(),
      locals,
      block.environment.clone(),
      block.home.clone(),
    );
    let frame = Frame::new(block.unit.clone(), block.method.clone(), Rc::new(environment));
    self.frames.push(frame);
    Ok(())
  }

  fn primitive(
    &mut self,
    primitive: Primitive,
    receiver: Value,
    arguments: Vec<Value>,
  ) -> Result<(), ErrorKind> {
    match primitive.perform(receiver, arguments, &mut self.output)? {
      Outcome::Value(value) => self.push(value),
      Outcome::Invoke(block, arguments) => self.invoke_block(&block, arguments),
      Outcome::Loop { condition, body, repeat_while } => {
        let depth = self.frames.len().saturating_sub(1);
        self.loops.push(Loop {
          depth,
          condition: condition.clone(),
          body,
          repeat_while,
          in_body: false,
        });
        self.invoke_block(&condition, Vec::new())
      }
    }
  }
}
impl<W: io::Write> fmt::Debug for VM<W> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("VM")
      .field("classes", &self.classes.len())
      .field("frames", &self.frames.len())
      .finish_non_exhaustive()
  }
}

/// The arguments followed by the locals, set to `nil`
fn slots(mut arguments: Vec<Value>, unit: &CompiledUnit) -> Vec<Value> {
  arguments.resize(unit.slot_count(), Value::Nil);
  arguments
}

fn literal(unit: &CompiledUnit, index: u16) -> Result<Rc<str>, ErrorKind> {
  (unit.literal(index).cloned()).ok_or(ErrorKind::Internal("literal index out of range"))
}

fn field<T>(
  receiver: &Value,
  index: u16,
  access: impl FnOnce(&mut Vec<Value>, usize) -> Option<T>,
) -> Result<T, ErrorKind> {
  let unknown_field = || ErrorKind::UnknownField {
    class: receiver.class_name().to_owned(),
    index,
  };

  match receiver {
    Value::Object(instance) => {
      let mut fields = instance.fields.borrow_mut();
      access(&mut *fields, usize::from(index)).ok_or_else(unknown_field)
    }
    _ => Err(unknown_field()),
  }
}

/// The error for a message with no method, depending on if a method exists on the
/// other side of the class
fn missing_method(receiver: &Value, selector: &str, other_side: Option<Rc<CompiledUnit>>) -> ErrorKind {
  let class = receiver.class_name().to_owned();
  let selector = selector.to_owned();

  match (other_side, receiver.is_class()) {
    (Some(_), true) => ErrorKind::InstanceMessageSentToClass { class, selector },
    (Some(_), false) => ErrorKind::ClassMessageSentToInstance { class, selector },
    (None, _) => ErrorKind::MessageNotUnderstood { class, selector },
  }
}

/// Run the entry class of a program with a new VM writing to stdout
///
/// # Errors
/// Returns an error if a runtime error is encountered in the bytecode being executed
pub fn execute(classes: ClassTable, entry: &str) -> Result<Value, RuntimeError> {
  VM::new(classes).run(entry)
}

/// An error whilst executing bytecode
#[derive(Debug, Clone)]
pub struct RuntimeError {
  kind: ErrorKind,
  traceback: Vec<TraceLocation>,
}
impl RuntimeError {
  /// The title of the error message
  #[must_use]
  pub fn title(&self) -> &'static str {
    self.kind.title()
  }

  /// The body of the error message describing what has gone wrong
  #[must_use]
  pub fn message(&self) -> String {
    self.kind.message()
  }

  /// The traceback of the error, innermost frame first
  #[must_use]
  pub fn traceback(&self) -> Option<String> {
    if self.traceback.is_empty() {
      return None;
    }

    let lines: Vec<_> = self.traceback.iter().map(ToString::to_string).collect();
    Some(lines.join("\n"))
  }

  /// The frames which were active when the error occurred, innermost first
  #[must_use]
  pub fn frames(&self) -> &[TraceLocation] {
    &self.traceback
  }
}
impl fmt::Display for RuntimeError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.message())
  }
}
impl error::Error for RuntimeError {}

/// A frame in the traceback of a [`RuntimeError`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceLocation {
  /// The qualified name of the method or block
  pub name: String,
  /// The file, line and column (1-based) of the last recorded source location
  pub position: Option<(String, u16, u16)>,
}
impl TraceLocation {
  fn from_frame(frame: &Frame) -> Self {
    let position = frame.location.map(|location| {
      let file = frame.unit.literal(location.file).map_or("?", |file| file);
      (file.to_owned(), location.line, location.column)
    });

    Self {
      name: frame.unit.name.to_string(),
      position,
    }
  }
}
impl fmt::Display for TraceLocation {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match &self.position {
      Some((file, line, column)) => write!(f, "    at {}({file}:{line}:{column})", self.name),
      None => write!(f, "    at {}", self.name),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ErrorKind {
  MessageNotUnderstood { class: String, selector: String },
  ClassMessageSentToInstance { class: String, selector: String },
  InstanceMessageSentToClass { class: String, selector: String },
  BlockCannotReturn { block: String },
  StackUnderflow,
  UndefinedGlobal(String),
  UnknownClass(String),
  MismatchedBlockArguments { expected: usize, got: usize },
  IndexOutOfRange { index: i32, size: usize },
  UnknownField { class: String, index: u16 },
  TypeError { expected: &'static str, got: String },
  DivisionByZero,
  Internal(&'static str),
}
impl ErrorKind {
  #[must_use]
  fn title(&self) -> &'static str {
    match self {
      Self::MessageNotUnderstood { .. } => "Message Not Understood",
      Self::ClassMessageSentToInstance { .. } => "Class Message Sent To Instance",
      Self::InstanceMessageSentToClass { .. } => "Instance Message Sent To Class",
      Self::BlockCannotReturn { .. } => "Block Cannot Return",
      Self::StackUnderflow => "Stack Underflow",
      Self::UndefinedGlobal(_) => "Undefined Global",
      Self::UnknownClass(_) => "Unknown Class",
      Self::MismatchedBlockArguments { .. } => "Mismatched Block Arguments",
      Self::IndexOutOfRange { .. } => "Index Out Of Range",
      Self::UnknownField { .. } => "Unknown Field",
      Self::TypeError { .. } => "Type Error",
      Self::DivisionByZero => "Division By Zero",
      Self::Internal(_) => "Internal Error",
    }
  }

  #[must_use]
  fn message(&self) -> String {
    match self {
      Self::MessageNotUnderstood { class, selector } => {
        format!("{class} does not understand #{selector}")
      }
      Self::ClassMessageSentToInstance { class, selector } => {
        format!("class method #{selector} sent to an instance of {class}")
      }
      Self::InstanceMessageSentToClass { class, selector } => {
        format!("instance method #{selector} sent to the class {class}")
      }
      Self::BlockCannotReturn { block } => {
        format!("{block} cannot return, its method has already returned")
      }
      Self::StackUnderflow => "the operand stack is empty".into(),
      Self::UndefinedGlobal(name) => format!("global `{name}` is not defined"),
      Self::UnknownClass(name) => format!("class `{name}` is not defined"),
      Self::MismatchedBlockArguments { expected, got } => {
        format!("block expects {expected} arguments, got {got}")
      }
      Self::IndexOutOfRange { index, size } => {
        format!("index {index} is out of range for a collection of size {size}")
      }
      Self::UnknownField { class, index } => format!("{class} has no field at {index}"),
      Self::TypeError { expected, got } => format!("expected `{expected}`, got `{got}`"),
      Self::DivisionByZero => "division by zero".into(),
      Self::Internal(message) => format!("internal error: {message}"),
    }
  }
}
