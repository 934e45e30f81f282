//! # Primitives
//!
//! Operations built in to the interpreter. They are used in two ways: directly when a
//! message to a built-in kind of value matches (see [`Value::builtin`]), and as the body
//! of methods declared `<primitive:#Name>` in source code.

use crate::{
  value::{BlockDescriptor, Instance, Value},
  vm::ErrorKind,
};
use std::{cmp::Ordering, io::Write, rc::Rc};

/// An operation performed by the interpreter without creating a context
#[allow(missing_docs, reason = "named after the messages they implement")]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
  // Numbers
  Add,
  Subtract,
  Multiply,
  /// Division, truncating for integers
  Divide,
  /// Division, rounding towards negative infinity
  FloorDivide,
  /// Remainder of floor division, with the sign of the divisor
  Remainder,
  /// The same as [`Primitive::Remainder`]
  Modulo,
  Less,
  LessEqual,
  Greater,
  GreaterEqual,
  Equal,
  NotEqual,
  AsFloat,
  AsInteger,
  AsCharacter,

  // All values
  AsString,
  PrintString,
  ClassName,
  Hash,
  Identical,

  // Collections
  Concatenate,
  Size,
  At,
  AtPut,
  AsArray,

  // Booleans
  IfTrue,
  IfFalse,
  IfTrueIfFalse,
  IfFalseIfTrue,
  Not,
  And,
  Or,

  // Blocks
  /// Invoke a block with the given number of arguments
  Value(u8),
  ValueWithArguments,
  NumArgs,
  /// Repeat the argument block while the receiver block gives `true`
  WhileTrue,
  /// Repeat the argument block while the receiver block gives `false`
  WhileFalse,

  // Class side
  BasicNew,
  NewArray,
  NewString,

  /// Print a line to the output of the virtual machine
  Show,
}
impl Primitive {
  const ALL: [Self; 46] = [
    Self::Add,
    Self::Subtract,
    Self::Multiply,
    Self::Divide,
    Self::FloorDivide,
    Self::Remainder,
    Self::Modulo,
    Self::Less,
    Self::LessEqual,
    Self::Greater,
    Self::GreaterEqual,
    Self::Equal,
    Self::NotEqual,
    Self::AsFloat,
    Self::AsInteger,
    Self::AsCharacter,
    Self::AsString,
    Self::PrintString,
    Self::ClassName,
    Self::Hash,
    Self::Identical,
    Self::Concatenate,
    Self::Size,
    Self::At,
    Self::AtPut,
    Self::AsArray,
    Self::IfTrue,
    Self::IfFalse,
    Self::IfTrueIfFalse,
    Self::IfFalseIfTrue,
    Self::Not,
    Self::And,
    Self::Or,
    Self::Value(0),
    Self::Value(1),
    Self::Value(2),
    Self::Value(3),
    Self::Value(4),
    Self::ValueWithArguments,
    Self::NumArgs,
    Self::WhileTrue,
    Self::WhileFalse,
    Self::BasicNew,
    Self::NewArray,
    Self::NewString,
    Self::Show,
  ];

  /// The name used to reference the primitive in source code
  #[must_use]
  pub fn name(self) -> &'static str {
    match self {
      Self::Add => "Number_ADD",
      Self::Subtract => "Number_SUB",
      Self::Multiply => "Number_MULT",
      Self::Divide => "Number_DIV",
      Self::FloorDivide => "Number_FLOORDIV",
      Self::Remainder => "Number_REM",
      Self::Modulo => "Number_MOD",
      Self::Less => "Number_LT",
      Self::LessEqual => "Number_LE",
      Self::Greater => "Number_GT",
      Self::GreaterEqual => "Number_GE",
      Self::Equal => "Object_EQ",
      Self::NotEqual => "Object_NE",
      Self::AsFloat => "Number_ASFLOAT",
      Self::AsInteger => "Object_ASINTEGER",
      Self::AsCharacter => "Object_ASCHARACTER",
      Self::AsString => "Object_ASSTRING",
      Self::PrintString => "Object_PRINTSTRING",
      Self::ClassName => "Object_CLASSNAME",
      Self::Hash => "Object_HASH",
      Self::Identical => "Object_SAME",
      Self::Concatenate => "String_CAT",
      Self::Size => "Collection_SIZE",
      Self::At => "Collection_AT",
      Self::AtPut => "Array_AT_PUT",
      Self::AsArray => "String_ASARRAY",
      Self::IfTrue => "Boolean_IFTRUE",
      Self::IfFalse => "Boolean_IFFALSE",
      Self::IfTrueIfFalse => "Boolean_IFTRUE_IFFALSE",
      Self::IfFalseIfTrue => "Boolean_IFFALSE_IFTRUE",
      Self::Not => "Boolean_NOT",
      Self::And => "Boolean_AND",
      Self::Or => "Boolean_OR",
      Self::Value(0) => "BlockDescriptor_VALUE",
      Self::Value(1) => "BlockDescriptor_VALUE_1_ARG",
      Self::Value(2) => "BlockDescriptor_VALUE_2_ARGS",
      Self::Value(3) => "BlockDescriptor_VALUE_3_ARGS",
      Self::Value(_) => "BlockDescriptor_VALUE_4_ARGS",
      Self::ValueWithArguments => "BlockDescriptor_VALUE_WITH_ARGUMENTS",
      Self::NumArgs => "BlockDescriptor_NUMARGS",
      Self::WhileTrue => "BlockDescriptor_WHILETRUE",
      Self::WhileFalse => "BlockDescriptor_WHILEFALSE",
      Self::BasicNew => "Object_Class_BASICNEW",
      Self::NewArray => "Array_Class_NEW",
      Self::NewString => "String_Class_NEW",
      Self::Show => "TranscriptStream_SHOW",
    }
  }

  /// Find a primitive by the name used in source code
  #[must_use]
  pub fn from_name(name: &str) -> Option<Self> {
    (Self::ALL.into_iter()).find(|primitive| primitive.name() == name)
  }

  /// Perform the operation.
  ///
  /// Block invocations are not performed here, instead the block and its arguments are
  /// returned for the virtual machine to create a new context. Loops are also left to
  /// the virtual machine, so each block activation returns before the next starts.
  pub(crate) fn perform(
    self,
    receiver: Value,
    arguments: Vec<Value>,
    output: &mut dyn Write,
  ) -> Result<Outcome, ErrorKind> {
    let argument = arguments.first().cloned().unwrap_or_default();

    let value = match self {
      Self::Add => numeric(&receiver, &argument, i32::wrapping_add, |a, b| a + b)?,
      Self::Subtract => numeric(&receiver, &argument, i32::wrapping_sub, |a, b| a - b)?,
      Self::Multiply => numeric(&receiver, &argument, i32::wrapping_mul, |a, b| a * b)?,
      Self::Divide => {
        check_divisor(&argument)?;
        numeric(&receiver, &argument, i32::wrapping_div, |a, b| a / b)?
      }
      Self::FloorDivide => {
        check_divisor(&argument)?;
        numeric(&receiver, &argument, floor_divide, |a, b| (a / b).floor())?
      }
      Self::Remainder | Self::Modulo => {
        check_divisor(&argument)?;
        numeric(&receiver, &argument, floor_remainder, |a, b| a - b * (a / b).floor())?
      }
      Self::Less => compare(&receiver, &argument, Ordering::is_lt)?,
      Self::LessEqual => compare(&receiver, &argument, Ordering::is_le)?,
      Self::Greater => compare(&receiver, &argument, Ordering::is_gt)?,
      Self::GreaterEqual => compare(&receiver, &argument, Ordering::is_ge)?,
      Self::Equal => Value::Boolean(receiver.is_equal(&argument)),
      Self::NotEqual => Value::Boolean(!receiver.is_equal(&argument)),
      Self::AsFloat => match receiver {
        #[allow(clippy::cast_precision_loss)]
        Value::Integer(value) => Value::Float(value as f32),
        Value::Float(_) => receiver,
        other => return Err(type_error("number", &other)),
      },
      Self::AsInteger => match receiver {
        Value::Integer(_) => receiver,
        #[allow(clippy::cast_possible_truncation)]
        Value::Float(value) => Value::Integer(value as i32),
        Value::Character(value) => Value::Integer(i32::try_from(u32::from(value)).unwrap_or(i32::MAX)),
        other => return Err(type_error("number or character", &other)),
      },
      Self::AsCharacter => match receiver {
        Value::Character(_) => receiver,
        Value::Integer(value) => u32::try_from(value)
          .ok()
          .and_then(char::from_u32)
          .map(Value::Character)
          .ok_or_else(|| ErrorKind::TypeError {
            expected: "character code",
            got: value.to_string(),
          })?,
        other => return Err(type_error("integer", &other)),
      },

      Self::AsString | Self::PrintString => Value::from(receiver.to_string()),
      Self::ClassName => Value::from(receiver.class_name()),
      Self::Hash => Value::Integer(receiver.hash_code()),
      Self::Identical => Value::Boolean(receiver.is_identical(&argument)),

      Self::Concatenate => match &receiver {
        Value::String(string) => Value::from(format!("{string}{argument}")),
        other => return Err(type_error("String", other)),
      },
      Self::Size => {
        let size = match &receiver {
          Value::String(string) => string.chars().count(),
          Value::Array(items) => items.borrow().len(),
          other => return Err(type_error("String or Array", other)),
        };
        Value::Integer(i32::try_from(size).unwrap_or(i32::MAX))
      }
      Self::At => match &receiver {
        Value::String(string) => {
          let length = string.chars().count();
          let index = offset(&argument, length)?;
          string.chars().nth(index).map(Value::Character).unwrap_or_default()
        }
        Value::Array(items) => {
          let items = items.borrow();
          let index = offset(&argument, items.len())?;
          items[index].clone()
        }
        other => return Err(type_error("String or Array", other)),
      },
      Self::AtPut => match &receiver {
        Value::Array(items) => {
          let mut items = items.borrow_mut();
          let index = offset(&argument, items.len())?;
          let value = arguments.get(1).cloned().unwrap_or_default();
          items[index] = value.clone();
          value
        }
        other => return Err(type_error("Array", other)),
      },
      Self::AsArray => match &receiver {
        Value::String(string) => Value::from(string.chars().map(Value::Character).collect::<Vec<_>>()),
        Value::Array(_) => receiver,
        other => return Err(type_error("String", other)),
      },

      Self::IfTrue => match receiver {
        Value::Boolean(true) => return evaluate(argument),
        Value::Boolean(false) => Value::Nil,
        other => return Err(type_error("Boolean", &other)),
      },
      Self::IfFalse => match receiver {
        Value::Boolean(false) => return evaluate(argument),
        Value::Boolean(true) => Value::Nil,
        other => return Err(type_error("Boolean", &other)),
      },
      Self::IfTrueIfFalse | Self::IfFalseIfTrue => {
        let condition = match receiver {
          Value::Boolean(condition) => condition,
          other => return Err(type_error("Boolean", &other)),
        };
        let take_first = (self == Self::IfTrueIfFalse) == condition;
        let branch = arguments.into_iter().nth(usize::from(!take_first));
        return evaluate(branch.unwrap_or_default());
      }
      Self::Not => Value::Boolean(!boolean(&receiver)?),
      Self::And => Value::Boolean(boolean(&receiver)? & boolean(&argument)?),
      Self::Or => Value::Boolean(boolean(&receiver)? | boolean(&argument)?),

      Self::Value(_) => {
        let block = block(&receiver)?;
        return invoke(block, arguments);
      }
      Self::ValueWithArguments => {
        let block = block(&receiver)?;
        let arguments = match &argument {
          Value::Array(items) => items.borrow().clone(),
          other => return Err(type_error("Array", other)),
        };
        return invoke(block, arguments);
      }
      Self::NumArgs => {
        let block = block(&receiver)?;
        Value::Integer(i32::from(block.unit.argument_count))
      }
      Self::WhileTrue | Self::WhileFalse => {
        let condition = block(&receiver)?;
        let body = block(&argument)?;
        for block in [&condition, &body] {
          if block.argument_count() != 0 {
            return Err(ErrorKind::MismatchedBlockArguments {
              expected: block.argument_count(),
              got: 0,
            });
          }
        }

        return Ok(Outcome::Loop {
          condition,
          body,
          repeat_while: self == Self::WhileTrue,
        });
      }

      Self::BasicNew => match &receiver {
        Value::Class(class) => Value::Object(Rc::new(Instance::new(class.clone()))),
        other => return Err(type_error("class", other)),
      },
      Self::NewArray => Value::from(vec![Value::Nil; size(&argument)?]),
      Self::NewString => Value::from(" ".repeat(size(&argument)?)),

      Self::Show => {
        writeln!(output, "{argument}").map_err(|_| ErrorKind::Internal("failed to write output"))?;
        receiver
      }
    };

    Ok(Outcome::Value(value))
  }
}

/// The result of performing a primitive
#[derive(Debug)]
pub(crate) enum Outcome {
  /// A value to push onto the stack
  Value(Value),
  /// A block to invoke with the arguments
  Invoke(Rc<BlockDescriptor>, Vec<Value>),
  /// Run the body block for as long as the condition block gives `repeat_while`
  Loop {
    condition: Rc<BlockDescriptor>,
    body: Rc<BlockDescriptor>,
    repeat_while: bool,
  },
}

fn type_error(expected: &'static str, got: &Value) -> ErrorKind {
  ErrorKind::TypeError {
    expected,
    got: got.class_name().to_owned(),
  }
}

fn numeric(
  left: &Value,
  right: &Value,
  integer: impl Fn(i32, i32) -> i32,
  float: impl Fn(f32, f32) -> f32,
) -> Result<Value, ErrorKind> {
  #[allow(clippy::cast_precision_loss)]
  let value = match (left, right) {
    (Value::Integer(a), Value::Integer(b)) => Value::Integer(integer(*a, *b)),
    (Value::Float(a), Value::Float(b)) => Value::Float(float(*a, *b)),
    (Value::Integer(a), Value::Float(b)) => Value::Float(float(*a as f32, *b)),
    (Value::Float(a), Value::Integer(b)) => Value::Float(float(*a, *b as f32)),
    (Value::Integer(_) | Value::Float(_), other) | (other, _) => {
      return Err(type_error("number", other));
    }
  };

  Ok(value)
}

fn compare(left: &Value, right: &Value, test: fn(Ordering) -> bool) -> Result<Value, ErrorKind> {
  let ordering = match (left, right) {
    (Value::Integer(a), Value::Integer(b)) => Some(a.cmp(b)),
    _ => as_float(left)?.partial_cmp(&as_float(right)?),
  };

  Ok(Value::Boolean(ordering.is_some_and(test)))
}

#[allow(clippy::cast_precision_loss)]
fn as_float(value: &Value) -> Result<f32, ErrorKind> {
  match value {
    Value::Integer(value) => Ok(*value as f32),
    Value::Float(value) => Ok(*value),
    other => Err(type_error("number", other)),
  }
}

fn check_divisor(divisor: &Value) -> Result<(), ErrorKind> {
  match divisor {
    Value::Integer(0) => Err(ErrorKind::DivisionByZero),
    Value::Float(value) if *value == 0.0 => Err(ErrorKind::DivisionByZero),
    _ => Ok(()),
  }
}

fn floor_divide(a: i32, b: i32) -> i32 {
  let quotient = a.wrapping_div(b);
  if a.wrapping_rem(b) != 0 && ((a < 0) != (b < 0)) {
    quotient.wrapping_sub(1)
  } else {
    quotient
  }
}

fn floor_remainder(a: i32, b: i32) -> i32 {
  let remainder = a.wrapping_rem(b);
  if remainder != 0 && ((remainder < 0) != (b < 0)) {
    remainder + b
  } else {
    remainder
  }
}

fn boolean(value: &Value) -> Result<bool, ErrorKind> {
  match value {
    Value::Boolean(value) => Ok(*value),
    other => Err(type_error("Boolean", other)),
  }
}

fn block(value: &Value) -> Result<Rc<BlockDescriptor>, ErrorKind> {
  match value {
    Value::Block(block) => Ok(block.clone()),
    other => Err(type_error("BlockDescriptor", other)),
  }
}

/// Evaluate a branch of a conditional, which may not be a block
fn evaluate(branch: Value) -> Result<Outcome, ErrorKind> {
  match branch {
    Value::Block(block) => invoke(block, Vec::new()),
    value => Ok(Outcome::Value(value)),
  }
}

fn invoke(block: Rc<BlockDescriptor>, arguments: Vec<Value>) -> Result<Outcome, ErrorKind> {
  if block.argument_count() != arguments.len() {
    return Err(ErrorKind::MismatchedBlockArguments {
      expected: block.argument_count(),
      got: arguments.len(),
    });
  }

  Ok(Outcome::Invoke(block, arguments))
}

/// Convert a one-based index into an offset, checking it is in range
fn offset(index: &Value, length: usize) -> Result<usize, ErrorKind> {
  let index = match index {
    Value::Integer(index) => *index,
    other => return Err(type_error("Integer", other)),
  };

  match usize::try_from(index) {
    Ok(offset @ 1..) if offset <= length => Ok(offset - 1),
    _ => Err(ErrorKind::IndexOutOfRange { index, size: length }),
  }
}

fn size(value: &Value) -> Result<usize, ErrorKind> {
  match value {
    Value::Integer(size) => {
      usize::try_from(*size).map_err(|_| ErrorKind::IndexOutOfRange { index: *size, size: 0 })
    }
    other => Err(type_error("Integer", other)),
  }
}
