//! # Bytecode
//!
//! The instruction set shared by the code generator and the virtual machine.
//!
//! Each instruction is a single byte opcode followed by fixed width little endian
//! operands. Literal operands index into the literal pool of the [`CompiledUnit`] the
//! instruction is part of.

use crate::{
  collections::{HashMap, String},
  primitives::Primitive,
};
use std::{fmt, rc::Rc};

/// An instruction of the virtual machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OpCode {
  // Stack literals
  /// Push `nil`
  Nil,
  /// Push `true`
  True,
  /// Push `false`
  False,
  /// Push the receiver
  SelfRef,
  /// Push an integer `(i32)`
  PushInteger,
  /// Push a float `(f32)`
  PushFloat,
  /// Push a character `(u32)`
  PushCharacter,
  /// Pop `n` values into a new array `(n: u16)`
  PushArray,
  /// Push a string from the literal pool `(literal: u16)`
  PushLiteral,

  // Storage access
  /// Push a class or global named by a literal `(literal: u16)`
  PushGlobal,
  /// Push a local or argument `(depth: u16, index: u16)`
  PushLocal,
  /// Push a field of the receiver `(index: u16)`
  PushField,
  /// Store the top of the stack into a local `(depth: u16, index: u16)`
  StoreLocal,
  /// Store the top of the stack into a field of the receiver `(index: u16)`
  StoreField,
  /// Discard the top of the stack
  Pop,

  // Message sends
  /// Send a message `(arguments: u16, selector: u16)`
  Send,
  /// Send a message, starting lookup in the static superclass `(arguments: u16, selector: u16)`
  SendSuper,

  // Control
  /// Create a closure from a nested unit of the enclosing method `(index: u16)`
  Block,
  /// Return the top of the stack from the current block to its invoker
  BlockReturn,
  /// Return the top of the stack from the enclosing method
  Return,
  /// Record the current source location `(file: u16, line: u16, column: u16)`
  Debug,
}
impl OpCode {
  /// Decode an opcode from its byte
  #[must_use]
  pub fn from_byte(byte: u8) -> Option<Self> {
    let opcode = match byte {
      0 => Self::Nil,
      1 => Self::True,
      2 => Self::False,
      3 => Self::SelfRef,
      4 => Self::PushInteger,
      5 => Self::PushFloat,
      6 => Self::PushCharacter,
      7 => Self::PushArray,
      8 => Self::PushLiteral,
      9 => Self::PushGlobal,
      10 => Self::PushLocal,
      11 => Self::PushField,
      12 => Self::StoreLocal,
      13 => Self::StoreField,
      14 => Self::Pop,
      15 => Self::Send,
      16 => Self::SendSuper,
      17 => Self::Block,
      18 => Self::BlockReturn,
      19 => Self::Return,
      20 => Self::Debug,
      _ => return None,
    };

    Some(opcode)
  }

  /// The length of the instruction in bytes, including the operands
  #[must_use]
  pub fn length(self) -> usize {
    match self {
      Self::Nil
      | Self::True
      | Self::False
      | Self::SelfRef
      | Self::Pop
      | Self::BlockReturn
      | Self::Return => 1,
      Self::PushArray
      | Self::PushLiteral
      | Self::PushGlobal
      | Self::PushField
      | Self::StoreField
      | Self::Block => 3,
      Self::PushInteger
      | Self::PushFloat
      | Self::PushCharacter
      | Self::PushLocal
      | Self::StoreLocal
      | Self::Send
      | Self::SendSuper => 5,
      Self::Debug => 7,
    }
  }
}

/// The bytecode and metadata for one method or block body
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledUnit {
  /// Fully qualified name, e.g. `Point>>x:y:` or `Point>>do:>>block0`
  pub name: String,
  /// The class the unit is defined in, used to find the superclass for super sends
  pub class_name: String,
  /// The instructions
  pub code: Vec<u8>,
  /// Strings, selectors and global names referenced by the instructions
  pub literals: Vec<Rc<str>>,
  /// The number of arguments, stored in the first local slots
  pub argument_count: u16,
  /// The number of local variables, excluding arguments
  pub local_count: u16,
  /// Units for the blocks defined lexically within a method, by block index
  pub blocks: Vec<Rc<CompiledUnit>>,
  /// Is this a class side method?
  pub is_class_method: bool,
  /// The built-in operation performed instead of running code
  pub primitive: Option<Primitive>,
}
impl CompiledUnit {
  /// A method which is implemented by the interpreter
  #[must_use]
  pub fn primitive(
    name: String,
    class_name: String,
    primitive: Primitive,
    argument_count: u16,
    is_class_method: bool,
  ) -> Self {
    Self {
      name,
      class_name,
      code: Vec::new(),
      literals: Vec::new(),
      argument_count,
      local_count: 0,
      blocks: Vec::new(),
      is_class_method,
      primitive: Some(primitive),
    }
  }

  /// The number of slots needed for arguments and locals
  #[must_use]
  pub fn slot_count(&self) -> usize {
    usize::from(self.argument_count) + usize::from(self.local_count)
  }

  /// Get the opcode at a given position
  #[must_use]
  pub fn opcode(&self, position: usize) -> Option<OpCode> {
    self.code.get(position).copied().and_then(OpCode::from_byte)
  }

  /// Read a `u16` operand
  #[must_use]
  pub fn read_u16(&self, position: usize) -> u16 {
    let bytes = [self.byte(position), self.byte(position + 1)];
    u16::from_le_bytes(bytes)
  }

  /// Read a `u32` operand
  #[must_use]
  pub fn read_u32(&self, position: usize) -> u32 {
    let bytes = [
      self.byte(position),
      self.byte(position + 1),
      self.byte(position + 2),
      self.byte(position + 3),
    ];
    u32::from_le_bytes(bytes)
  }

  fn byte(&self, position: usize) -> u8 {
    self.code.get(position).copied().unwrap_or_default()
  }

  /// Get a literal from the pool
  #[must_use]
  pub fn literal(&self, index: u16) -> Option<&Rc<str>> {
    self.literals.get(usize::from(index))
  }

  fn literal_text(&self, index: u16) -> &str {
    self.literal(index).map_or("?", |literal| literal)
  }
}

impl fmt::Display for CompiledUnit {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    writeln!(f, "      ╭─[Bytecode: {}]", self.name)?;

    if let Some(primitive) = self.primitive {
      writeln!(f, "      │ <primitive:#{}>", primitive.name())?;
    }

    let mut position: usize = 0;
    while let Some(opcode) = self.opcode(position) {
      write!(f, " {position:0>4} │ ")?;
      match opcode {
        OpCode::PushInteger => write!(f, "PushInteger {}", self.read_u32(position + 1).cast_signed()),
        OpCode::PushFloat => write!(f, "PushFloat {}", f32::from_bits(self.read_u32(position + 1))),
        OpCode::PushCharacter => {
          let character = char::from_u32(self.read_u32(position + 1)).unwrap_or_default();
          write!(f, "PushCharacter ${character}")
        }
        OpCode::PushArray => write!(f, "PushArray ({})", self.read_u16(position + 1)),
        OpCode::PushLiteral | OpCode::PushGlobal => {
          let index = self.read_u16(position + 1);
          write!(f, "{opcode:?} '{}' ({index})", self.literal_text(index))
        }
        OpCode::PushLocal | OpCode::StoreLocal => {
          let depth = self.read_u16(position + 1);
          let index = self.read_u16(position + 3);
          write!(f, "{opcode:?} {depth}:{index}")
        }
        OpCode::PushField | OpCode::StoreField => {
          write!(f, "{opcode:?} ({})", self.read_u16(position + 1))
        }
        OpCode::Send | OpCode::SendSuper => {
          let arguments = self.read_u16(position + 1);
          let selector = self.read_u16(position + 3);
          write!(f, "{opcode:?} #{} ({arguments})", self.literal_text(selector))
        }
        OpCode::Block => write!(f, "Block ({})", self.read_u16(position + 1)),
        OpCode::Debug => {
          let file = self.read_u16(position + 1);
          let line = self.read_u16(position + 3);
          let column = self.read_u16(position + 5);
          write!(f, "Debug '{}' {line}:{column}", self.literal_text(file))
        }
        code => write!(f, "{code:?}"),
      }?;
      writeln!(f)?;
      position += opcode.length();
    }

    writeln!(f, "──────╯")?;

    for block in &self.blocks {
      write!(f, "{block}")?;
    }

    Ok(())
  }
}

/// Builds up a [`CompiledUnit`] as code is generated
#[derive(Debug)]
pub struct UnitBuilder {
  name: String,
  class_name: String,
  code: Vec<u8>,
  literals: Vec<Rc<str>>,
  literal_lookup: HashMap<Rc<str>, u16>,
  blocks: Vec<Option<Rc<CompiledUnit>>>,
  argument_count: u16,
  local_count: u16,
  is_class_method: bool,
}
impl UnitBuilder {
  /// Start a new unit
  pub fn new(name: String, class_name: String) -> Self {
    Self {
      name,
      class_name,
      code: Vec::new(),
      literals: Vec::new(),
      literal_lookup: HashMap::default(),
      blocks: Vec::new(),
      argument_count: 0,
      local_count: 0,
      is_class_method: false,
    }
  }

  /// Set the counts of arguments and locals
  pub fn set_slots(&mut self, argument_count: u16, local_count: u16) {
    self.argument_count = argument_count;
    self.local_count = local_count;
  }

  /// Mark the unit as a class side method
  pub fn set_class_method(&mut self, is_class_method: bool) {
    self.is_class_method = is_class_method;
  }

  /// Add an opcode
  pub fn add_opcode(&mut self, code: OpCode) {
    self.code.push(code as u8);
  }

  /// Add a `u16` operand
  pub fn add_u16(&mut self, value: u16) {
    self.code.extend_from_slice(&value.to_le_bytes());
  }

  /// Add a `u32` operand
  pub fn add_u32(&mut self, value: u32) {
    self.code.extend_from_slice(&value.to_le_bytes());
  }

  /// Intern a literal, reusing the index if it has been added before
  ///
  /// Returns `None` if the pool is full
  pub fn add_literal(&mut self, literal: &str) -> Option<u16> {
    if let Some(index) = self.literal_lookup.get(literal) {
      return Some(*index);
    }

    let index = u16::try_from(self.literals.len()).ok()?;
    let literal: Rc<str> = Rc::from(literal);
    self.literals.push(literal.clone());
    self.literal_lookup.insert(literal, index);
    Some(index)
  }

  /// Add the unit of a nested block, at its block index
  pub fn add_block(&mut self, index: u16, unit: Rc<CompiledUnit>) {
    let index = usize::from(index);
    if self.blocks.len() <= index {
      self.blocks.resize(index + 1, None);
    }
    self.blocks[index] = Some(unit);
  }

  /// Finish the unit
  ///
  /// Returns `None` if a block index was never filled in
  pub fn finalize(self) -> Option<CompiledUnit> {
    let blocks = self.blocks.into_iter().collect::<Option<Vec<_>>>()?;

    Some(CompiledUnit {
      name: self.name,
      class_name: self.class_name,
      code: self.code,
      literals: self.literals,
      argument_count: self.argument_count,
      local_count: self.local_count,
      blocks,
      is_class_method: self.is_class_method,
      primitive: None,
    })
  }
}
