use crate::{
  bytecode::CompiledUnit,
  context::Environment,
  object::MetaClass,
  primitives::Primitive,
};
use rustc_hash::FxHasher;
use std::{
  cell::RefCell,
  fmt,
  hash::{Hash, Hasher},
  rc::Rc,
};

/// A value in the virtual machine.
///
/// Built-in kinds are stored directly and are distinguished by their tag,
/// everything else is an [`Instance`] of a user defined class.
///
/// Reference kinds (strings, arrays, blocks, instances and classes) share their
/// contents when cloned.
#[derive(Clone, Default)]
pub enum Value {
  /// `nil`
  #[default]
  Nil,
  /// `true` or `false`
  Boolean(bool),
  /// A 32-bit signed integer
  Integer(i32),
  /// A 32-bit float
  Float(f32),
  /// A unicode scalar value
  Character(char),
  /// An immutable string
  String(Rc<str>),
  /// A fixed size, mutable array
  Array(Rc<RefCell<Vec<Value>>>),
  /// A closure
  Block(Rc<BlockDescriptor>),
  /// An instance of a class
  Object(Rc<Instance>),
  /// A class object, which receives class side messages
  Class(Rc<MetaClass>),
}

impl Value {
  /// The name of the class the value is an instance of
  #[must_use]
  pub fn class_name(&self) -> &str {
    match self {
      Self::Nil => "UndefinedObject",
      Self::Boolean(_) => "Boolean",
      Self::Integer(_) => "Integer",
      Self::Float(_) => "Float",
      Self::Character(_) => "Character",
      Self::String(_) => "String",
      Self::Array(_) => "Array",
      Self::Block(_) => "BlockDescriptor",
      Self::Object(instance) => &instance.class.name,
      Self::Class(class) => &class.name,
    }
  }

  /// Is the value a class object?
  #[must_use]
  pub fn is_class(&self) -> bool {
    matches!(self, Self::Class(_))
  }

  /// The operation built in to the interpreter for a message, if there is one.
  ///
  /// These are performed directly, without looking up a method or creating a context.
  #[must_use]
  pub fn builtin(&self, selector: &str, arity: usize) -> Option<Primitive> {
    use Primitive as P;

    let primitive = match (self, arity) {
      (Self::Integer(_), 0) => match selector {
        "asString" => P::AsString,
        "printString" => P::PrintString,
        "hash" => P::Hash,
        "asFloat" => P::AsFloat,
        "asInteger" => P::AsInteger,
        "asCharacter" => P::AsCharacter,
        "className" => P::ClassName,
        _ => return None,
      },
      (Self::Integer(_), 1) => match selector {
        "//" => P::FloorDivide,
        "\\\\" => P::Remainder,
        "mod:" => P::Modulo,
        _ => return arithmetic(selector),
      },
      (Self::Float(_), 0) => match selector {
        "asString" => P::AsString,
        "printString" => P::PrintString,
        "asInteger" => P::AsInteger,
        "asFloat" => P::AsFloat,
        "className" => P::ClassName,
        _ => return None,
      },
      (Self::Float(_), 1) => return arithmetic(selector),
      (Self::Character(_), 0) => match selector {
        "asInteger" => P::AsInteger,
        "asCharacter" => P::AsCharacter,
        "asString" => P::AsString,
        "className" => P::ClassName,
        _ => return None,
      },
      (Self::Character(_), 1) => match selector {
        "=" => P::Equal,
        "~=" => P::NotEqual,
        _ => return None,
      },
      (Self::String(_), 0) => match selector {
        "asString" => P::AsString,
        "size" => P::Size,
        "asArray" => P::AsArray,
        "className" => P::ClassName,
        _ => return None,
      },
      (Self::String(_), 1) => match selector {
        "," => P::Concatenate,
        "=" | "==" => P::Equal,
        "at:" => P::At,
        _ => return None,
      },
      (Self::Boolean(_), 0) => match selector {
        "not" => P::Not,
        "asString" => P::AsString,
        "className" => P::ClassName,
        _ => return None,
      },
      (Self::Boolean(_), 1) => match selector {
        "ifTrue:" => P::IfTrue,
        "ifFalse:" => P::IfFalse,
        "&" => P::And,
        "|" => P::Or,
        _ => return None,
      },
      (Self::Boolean(_), 2) => match selector {
        "ifTrue:ifFalse:" => P::IfTrueIfFalse,
        "ifFalse:ifTrue:" => P::IfFalseIfTrue,
        _ => return None,
      },
      (Self::Array(_), 0) => match selector {
        "size" => P::Size,
        "asString" => P::AsString,
        "className" => P::ClassName,
        _ => return None,
      },
      (Self::Array(_), 1) if selector == "at:" => P::At,
      (Self::Array(_), 2) if selector == "at:put:" => P::AtPut,
      (Self::Block(_), 0) => match selector {
        "value" => P::Value(0),
        "numArgs" => P::NumArgs,
        _ => return None,
      },
      (Self::Block(_), 1) if selector == "valueWithArguments:" => P::ValueWithArguments,
      (Self::Block(_), 1) if selector == "whileTrue:" => P::WhileTrue,
      (Self::Block(_), 1) if selector == "whileFalse:" => P::WhileFalse,
      (Self::Block(_), arity @ 1..=4) => {
        let expected = "value:".repeat(arity);
        if selector != expected {
          return None;
        }
        P::Value(u8::try_from(arity).ok()?)
      }
      _ => return None,
    };

    Some(primitive)
  }

  /// Are the two values the same object?
  #[must_use]
  pub fn is_identical(&self, other: &Self) -> bool {
    match (self, other) {
      (Self::Nil, Self::Nil) => true,
      (Self::Boolean(a), Self::Boolean(b)) => a == b,
      (Self::Integer(a), Self::Integer(b)) => a == b,
      (Self::Float(a), Self::Float(b)) => a.to_bits() == b.to_bits(),
      (Self::Character(a), Self::Character(b)) => a == b,
      (Self::String(a), Self::String(b)) => Rc::ptr_eq(a, b),
      (Self::Array(a), Self::Array(b)) => Rc::ptr_eq(a, b),
      (Self::Block(a), Self::Block(b)) => Rc::ptr_eq(a, b),
      (Self::Object(a), Self::Object(b)) => Rc::ptr_eq(a, b),
      (Self::Class(a), Self::Class(b)) => Rc::ptr_eq(a, b),
      _ => false,
    }
  }

  /// Are the two values equal?
  ///
  /// Numbers compare by value across integers and floats, strings by their contents,
  /// everything else by identity.
  #[must_use]
  pub fn is_equal(&self, other: &Self) -> bool {
    match (self, other) {
      (Self::Integer(a), Self::Float(b)) | (Self::Float(b), Self::Integer(a)) => {
        #[allow(clippy::cast_precision_loss)]
        let a = *a as f32;
        a == *b
      }
      (Self::Float(a), Self::Float(b)) => a == b,
      (Self::String(a), Self::String(b)) => a == b,
      _ => self.is_identical(other),
    }
  }

  /// A hash of the value, consistent with [`Value::is_equal`] for built-in kinds
  #[must_use]
  pub fn hash_code(&self) -> i32 {
    let mut hasher = FxHasher::default();
    match self {
      Self::Integer(value) => return *value,
      Self::Nil => 0.hash(&mut hasher),
      Self::Boolean(value) => value.hash(&mut hasher),
      Self::Float(value) => value.to_bits().hash(&mut hasher),
      Self::Character(value) => value.hash(&mut hasher),
      Self::String(value) => value.hash(&mut hasher),
      Self::Array(value) => Rc::as_ptr(value).hash(&mut hasher),
      Self::Block(value) => Rc::as_ptr(value).hash(&mut hasher),
      Self::Object(value) => Rc::as_ptr(value).hash(&mut hasher),
      Self::Class(value) => Rc::as_ptr(value).hash(&mut hasher),
    }

    #[allow(clippy::cast_possible_truncation)]
    let hash = (hasher.finish() & 0x3fff_ffff) as i32;
    hash
  }
}

impl fmt::Display for Value {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Nil => write!(f, "nil"),
      Self::Boolean(value) => write!(f, "{value}"),
      Self::Integer(value) => write!(f, "{value}"),
      Self::Float(value) => write!(f, "{}", format_float(*value)),
      Self::Character(value) => write!(f, "${value}"),
      Self::String(value) => write!(f, "{value}"),
      Self::Array(items) => {
        write!(f, "{{")?;
        for (index, item) in items.borrow().iter().enumerate() {
          if index > 0 {
            write!(f, ". ")?;
          }
          write!(f, "{item}")?;
        }
        write!(f, "}}")
      }
      Self::Block(_) => write!(f, "a BlockDescriptor"),
      Self::Object(instance) => write!(f, "a {}", instance.class.name),
      Self::Class(class) => write!(f, "{}", class.name),
    }
  }
}
impl fmt::Debug for Value {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::String(value) => write!(f, "'{value}'"),
      value => write!(f, "{value}"),
    }
  }
}

/// Up to five decimal places, without trailing zeros
fn format_float(value: f32) -> String {
  let text = format!("{value:.5}");
  if !text.contains('.') {
    return text;
  }

  let text = text.trim_end_matches('0');
  if text.ends_with('.') { format!("{text}0") } else { text.to_owned() }
}

impl From<bool> for Value {
  fn from(value: bool) -> Self {
    Self::Boolean(value)
  }
}
impl From<i32> for Value {
  fn from(value: i32) -> Self {
    Self::Integer(value)
  }
}
impl From<f32> for Value {
  fn from(value: f32) -> Self {
    Self::Float(value)
  }
}
impl From<char> for Value {
  fn from(value: char) -> Self {
    Self::Character(value)
  }
}
impl From<&str> for Value {
  fn from(value: &str) -> Self {
    Self::String(Rc::from(value))
  }
}
impl From<String> for Value {
  fn from(value: String) -> Self {
    Self::String(Rc::from(value))
  }
}
impl From<Vec<Value>> for Value {
  fn from(value: Vec<Value>) -> Self {
    Self::Array(Rc::new(RefCell::new(value)))
  }
}

/// Selectors for binary operators on numbers
fn arithmetic(selector: &str) -> Option<Primitive> {
  let primitive = match selector {
    "+" => Primitive::Add,
    "-" => Primitive::Subtract,
    "*" => Primitive::Multiply,
    "/" => Primitive::Divide,
    "<" => Primitive::Less,
    "<=" => Primitive::LessEqual,
    ">" => Primitive::Greater,
    ">=" => Primitive::GreaterEqual,
    "=" => Primitive::Equal,
    "~=" => Primitive::NotEqual,
    _ => return None,
  };

  Some(primitive)
}

/// A closure.
///
/// A template for block activations: each invocation creates a fresh environment
/// for its arguments and locals, whose parent is the environment the block was
/// created in.
pub struct BlockDescriptor {
  /// The code of the block
  pub unit: Rc<CompiledUnit>,
  /// The method the block is lexically inside of, which holds the table of blocks
  pub method: Rc<CompiledUnit>,
  /// The environment the block was created in
  pub environment: Rc<Environment>,
  /// The environment of the method the block is lexically inside of
  pub home: Rc<Environment>,
  /// The receiver of the method the block was created in
  pub receiver: Value,
}
impl BlockDescriptor {
  /// The number of arguments the block expects
  #[must_use]
  pub fn argument_count(&self) -> usize {
    usize::from(self.unit.argument_count)
  }
}
impl fmt::Debug for BlockDescriptor {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("BlockDescriptor")
      .field("unit", &self.unit.name)
      .finish_non_exhaustive()
  }
}

/// An instance of a class, with a flat vector of fields
pub struct Instance {
  /// The class of the object
  pub class: Rc<MetaClass>,
  /// The values of the fields, inherited fields first
  pub fields: RefCell<Vec<Value>>,
}
impl Instance {
  /// Create an instance with all the fields set to `nil`
  #[must_use]
  pub fn new(class: Rc<MetaClass>) -> Self {
    let fields = vec![Value::Nil; class.fields.len()];
    Self {
      class,
      fields: RefCell::new(fields),
    }
  }
}
impl fmt::Debug for Instance {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "a {}", self.class.name)
  }
}
