//! # Interpreter
//! Bytecode compiler and virtual machine for running Smalltalk programs.
//!
//! Compilation is split into passes over the syntax tree. The definition pass declares
//! every class, method, block and variable into a [`SymbolTable`], the resolution pass
//! links every name to its declaration, and the code generator produces a
//! [`CompiledUnit`] for each method and block. The [`ClassTable`] is then built from the
//! symbols, and is run by the [`VM`].

mod bytecode;
mod compiler;
mod context;
mod define;
mod object;
mod primitives;
mod resolve;
mod symbols;
mod value;
mod vm;

/// More efficient datastructures than in standard library
pub(crate) mod collections {
  pub use rustc_hash::{FxHashMap as HashMap, FxHashSet as HashSet};
  pub use smartstring::alias::String;
}

#[cfg(test)]
mod test;

/// Compile an AST, along with the standard image, using the default options
///
/// # Examples
/// ```
/// let ast = smalltalk_syntax::parse("^3 + 4".to_owned());
/// let compilation = smalltalk_interpreter::compile(&ast);
///
/// assert!(compilation.is_valid());
/// ```
#[must_use]
pub fn compile(ast: &smalltalk_syntax::AST) -> Compilation {
  compile_with(ast, CompileOptions::default())
}

/// Compile an AST with the given options
#[must_use]
pub fn compile_with(ast: &smalltalk_syntax::AST, options: CompileOptions) -> Compilation {
  let mut compiler = Compiler::new(options);
  compiler.compile(ast);
  compiler.finish()
}

/// Compile and run the source of a program, writing output to stdout
///
/// # Examples
/// ```
/// let result = smalltalk_interpreter::run("^3 + 4").unwrap();
///
/// assert_eq!(result.to_string(), "7");
/// ```
///
/// # Errors
/// If the program doesn't compile, the compile errors are returned. If there is an error
/// whilst running, the runtime error is returned.
pub fn run(source: &str) -> Result<Value, Error> {
  let ast = smalltalk_syntax::parse(source.to_owned());
  if !ast.is_valid() {
    return Err(Error::Parse(ast.errors));
  }

  let compilation = compile(&ast);
  if !compilation.is_valid() {
    return Err(Error::Compile(compilation.errors));
  }

  Ok(execute(compilation.class_table(), MAIN_CLASS)?)
}

/// A problem found when compiling or running a program
#[derive(Debug)]
pub enum Error {
  /// The source has syntax errors
  Parse(Vec<smalltalk_syntax::ParseError>),
  /// The program has compile errors
  Compile(Vec<CompileError>),
  /// An error whilst running the program
  Runtime(RuntimeError),
}
impl From<RuntimeError> for Error {
  fn from(error: RuntimeError) -> Self {
    Self::Runtime(error)
  }
}
impl std::fmt::Display for Error {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Self::Parse(errors) => {
        let messages: Vec<_> = errors.iter().map(ToString::to_string).collect();
        write!(f, "{}", messages.join("\n"))
      }
      Self::Compile(errors) => {
        let messages: Vec<_> = errors.iter().map(ToString::to_string).collect();
        write!(f, "{}", messages.join("\n"))
      }
      Self::Runtime(error) => write!(f, "{error}"),
    }
  }
}
impl std::error::Error for Error {}

pub use bytecode::{CompiledUnit, OpCode};
pub use compiler::{Compilation, CompileError, CompileErrorKind, CompileOptions, Compiler};
pub use context::Environment;
pub use define::{MAIN_CLASS, MAIN_METHOD};
pub use object::{ClassTable, MetaClass};
pub use primitives::Primitive;
pub use symbols::{
  DeclarationError, Scope, ScopeId, ScopeKind, Symbol, SymbolId, SymbolKind, SymbolTable,
  UnresolvedName,
};
pub use value::{BlockDescriptor, Instance, Value};
pub use vm::{RuntimeError, TraceLocation, VM, execute};
