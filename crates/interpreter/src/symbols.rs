//! # Symbols
//!
//! The static model of a program: the classes, methods, blocks and variables it
//! declares, and the lexical scopes they are declared in.
//!
//! Scopes and symbols are stored in flat arenas and reference each other by id. Every
//! symbol except classes has an index given when it is declared, in declaration order,
//! which becomes its slot in the running program.

use crate::{
  bytecode::CompiledUnit,
  collections::{HashMap, String},
  primitives::Primitive,
};
use std::{fmt, ops, rc::Rc};

/// Id of a [`Scope`] in the [`SymbolTable`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(u32);

/// Id of a [`Symbol`] in the [`SymbolTable`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymbolId(u32);

/// A declared name
#[derive(Debug, Clone)]
pub struct Symbol {
  /// The name of the symbol
  pub name: String,
  /// What was declared
  pub kind: SymbolKind,
  /// The scope the symbol was declared in
  pub scope: ScopeId,
  /// Position in declaration order, the slot or field offset for variables
  pub index: u16,
}
impl Symbol {
  /// Is the symbol a field, argument or local variable?
  #[must_use]
  pub fn is_variable(&self) -> bool {
    matches!(
      self.kind,
      SymbolKind::Field | SymbolKind::Argument | SymbolKind::Local
    )
  }
}

/// The kind of thing a [`Symbol`] names
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SymbolKind {
  /// A class, and the scope of its body
  Class(ScopeId),
  /// A method with code, and the scope of its body
  Method {
    /// The scope of the method body
    scope: ScopeId,
    /// Is it a class side method?
    class_side: bool,
  },
  /// A method implemented by the interpreter
  PrimitiveMethod {
    /// The built-in operation
    primitive: Primitive,
    /// Is it a class side method?
    class_side: bool,
    /// The number of arguments it takes
    arguments: u16,
  },
  /// A block, and the scope of its body
  Block(ScopeId),
  /// An instance variable
  Field,
  /// A method or block argument
  Argument,
  /// A local variable of a method or block
  Local,
}

/// A lexical scope
#[derive(Debug, Clone)]
pub struct Scope {
  /// The name of the scope, e.g. the class name or method selector
  pub name: String,
  /// What opened the scope
  pub kind: ScopeKind,
  /// The scope this one is nested inside of, only `None` for the global scope
  pub enclosing: Option<ScopeId>,
  /// The symbols declared directly in this scope, in declaration order
  symbols: Vec<SymbolId>,
  /// Variables and classes visible by name
  names: HashMap<String, SymbolId>,
  /// The next free slot for arguments and locals
  next_slot: u16,
  /// The number of arguments
  pub argument_count: u16,
  /// The generated code, for method and block scopes
  pub unit: Option<Rc<CompiledUnit>>,
}
impl Scope {
  /// The ids of the symbols declared directly in the scope, in declaration order
  pub fn symbols(&self) -> impl ExactSizeIterator<Item = SymbolId> + '_ {
    self.symbols.iter().copied()
  }

  /// The number of locals declared, excluding the arguments
  #[must_use]
  pub fn local_count(&self) -> u16 {
    self.next_slot - self.argument_count
  }

  /// Is it the scope of a method or a block, which has its own variables at runtime?
  #[must_use]
  pub fn is_activation(&self) -> bool {
    matches!(self.kind, ScopeKind::Method { .. } | ScopeKind::Block { .. })
  }
}

/// The kind of construct which opened a [`Scope`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeKind {
  /// The top level, where classes are declared
  Global,
  /// The body of a class
  Class {
    /// The class the fields and methods are inherited from
    superclass: Option<ScopeId>,
    /// The number of fields, including inherited ones
    field_count: u16,
    /// Instance side methods, by selector
    methods: HashMap<String, SymbolId>,
    /// Class side methods, by selector
    class_methods: HashMap<String, SymbolId>,
  },
  /// The body of a method
  Method {
    /// Is it a class side method?
    class_side: bool,
    /// The number of blocks lexically inside the method
    block_count: u16,
  },
  /// The body of a block
  Block {
    /// The position of the block in the table of its enclosing method
    index: u16,
  },
}

/// Why a symbol couldn't be declared
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclarationError {
  /// A symbol with the same name is already declared in the scope
  DuplicateDefinition,
  /// The maximum number of variables has been reached
  TooManyVariables,
}

/// No symbol was found for a name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnresolvedName;

/// The scopes and symbols of a program
#[derive(Debug, Clone)]
pub struct SymbolTable {
  scopes: Vec<Scope>,
  symbols: Vec<Symbol>,
}
impl SymbolTable {
  /// The outermost scope, where classes are declared
  pub const GLOBAL: ScopeId = ScopeId(0);

  /// Create a table with only the global scope
  #[must_use]
  pub fn new() -> Self {
    Self {
      scopes: vec![Scope {
        name: String::new(),
        kind: ScopeKind::Global,
        enclosing: None,
        symbols: Vec::new(),
        names: HashMap::default(),
        next_slot: 0,
        argument_count: 0,
        unit: None,
      }],
      symbols: Vec::new(),
    }
  }

  /// Open a new scope
  pub fn add_scope(&mut self, name: &str, kind: ScopeKind, enclosing: ScopeId) -> ScopeId {
    let id = ScopeId(u32::try_from(self.scopes.len()).unwrap_or(u32::MAX));
    self.scopes.push(Scope {
      name: name.into(),
      kind,
      enclosing: Some(enclosing),
      symbols: Vec::new(),
      names: HashMap::default(),
      next_slot: 0,
      argument_count: 0,
      unit: None,
    });
    id
  }

  fn add_symbol(&mut self, name: &str, kind: SymbolKind, scope: ScopeId, index: u16) -> SymbolId {
    let id = SymbolId(u32::try_from(self.symbols.len()).unwrap_or(u32::MAX));
    self.symbols.push(Symbol {
      name: name.into(),
      kind,
      scope,
      index,
    });
    self.scopes[scope.position()].symbols.push(id);
    id
  }

  /// Declare a class, field, argument or local variable in a scope.
  ///
  /// Fields are numbered after all the fields of the superclasses, arguments and locals
  /// share one numbering with arguments first.
  ///
  /// # Errors
  /// If the name is already declared directly in the scope
  pub fn declare(
    &mut self,
    scope: ScopeId,
    name: &str,
    kind: SymbolKind,
  ) -> Result<SymbolId, DeclarationError> {
    if self[scope].names.contains_key(name) {
      return Err(DeclarationError::DuplicateDefinition);
    }

    let position = scope.position();
    let index = match kind {
      SymbolKind::Field => match &mut self.scopes[position].kind {
        ScopeKind::Class { field_count, .. } => {
          let index = *field_count;
          *field_count = (field_count.checked_add(1)).ok_or(DeclarationError::TooManyVariables)?;
          index
        }
        _ => 0,
      },
      SymbolKind::Argument | SymbolKind::Local => {
        let scope = &mut self.scopes[position];
        let index = scope.next_slot;
        scope.next_slot = (scope.next_slot.checked_add(1)).ok_or(DeclarationError::TooManyVariables)?;
        if kind == SymbolKind::Argument {
          scope.argument_count += 1;
        }
        index
      }
      _ => 0,
    };

    let id = self.add_symbol(name, kind, scope, index);
    self.scopes[scope.position()].names.insert(name.into(), id);
    Ok(id)
  }

  /// Declare a method in a class, on the instance or class side.
  ///
  /// # Errors
  /// If the selector is already declared on the same side of the class
  pub fn declare_method(
    &mut self,
    class: ScopeId,
    selector: &str,
    kind: SymbolKind,
  ) -> Result<SymbolId, DeclarationError> {
    let class_side = match kind {
      SymbolKind::Method { class_side, .. } | SymbolKind::PrimitiveMethod { class_side, .. } => {
        class_side
      }
      _ => false,
    };

    let Some(methods) = self.scopes[class.position()].kind.methods(class_side) else {
      return Err(DeclarationError::DuplicateDefinition);
    };
    if methods.contains_key(selector) {
      return Err(DeclarationError::DuplicateDefinition);
    }
    let index = u16::try_from(methods.len()).map_err(|_| DeclarationError::TooManyVariables)?;

    let id = self.add_symbol(selector, kind, class, index);
    if let Some(methods) = self.scopes[class.position()].kind.methods_mut(class_side) {
      methods.insert(selector.into(), id);
    }
    Ok(id)
  }

  /// Is a method with the selector declared directly in the class, on the given side?
  #[must_use]
  pub fn has_method(&self, class: ScopeId, selector: &str, class_side: bool) -> bool {
    (self[class].kind.methods(class_side)).is_some_and(|methods| methods.contains_key(selector))
  }

  /// Declare a block inside a method or block, numbering it within the enclosing method
  pub fn declare_block(&mut self, enclosing: ScopeId) -> (SymbolId, ScopeId) {
    let method = self.enclosing_method(enclosing).unwrap_or(enclosing);
    let index = match &mut self.scopes[method.position()].kind {
      ScopeKind::Method { block_count, .. } => {
        let index = *block_count;
        *block_count = block_count.saturating_add(1);
        index
      }
      _ => 0,
    };

    let name = format!("block{index}");
    let scope = self.add_scope(&name, ScopeKind::Block { index }, enclosing);
    let symbol = self.add_symbol(&name, SymbolKind::Block(scope), enclosing, index);
    (symbol, scope)
  }

  /// Find the symbol a name refers to, looking in the scope, then its superclasses if it
  /// is a class, and then the enclosing scopes.
  ///
  /// In a class, fields are found before instance side methods, so a field can share
  /// its name with an accessor.
  ///
  /// # Errors
  /// If no symbol is found
  pub fn resolve(&self, scope: ScopeId, name: &str) -> Result<SymbolId, UnresolvedName> {
    let mut current = Some(scope);

    while let Some(scope) = current {
      if let Some(symbol) = self[scope].names.get(name) {
        return Ok(*symbol);
      }

      let mut superclass = self.superclass(scope);
      while let Some(class) = superclass {
        if let Some(symbol) = self[class].names.get(name) {
          return Ok(*symbol);
        }
        superclass = self.superclass(class);
      }

      let mut class = Some(scope);
      while let Some(id) = class {
        if let Some(symbol) = self[id].kind.methods(false).and_then(|methods| methods.get(name)) {
          return Ok(*symbol);
        }
        class = self.superclass(id);
      }

      current = self[scope].enclosing;
    }

    Err(UnresolvedName)
  }

  /// The superclass of a class scope
  #[must_use]
  pub fn superclass(&self, class: ScopeId) -> Option<ScopeId> {
    match self[class].kind {
      ScopeKind::Class { superclass, .. } => superclass,
      _ => None,
    }
  }

  /// The scope of a class declared with the given name
  #[must_use]
  pub fn lookup_class(&self, name: &str) -> Option<ScopeId> {
    let symbol = self[Self::GLOBAL].names.get(name)?;
    match self[*symbol].kind {
      SymbolKind::Class(scope) => Some(scope),
      _ => None,
    }
  }

  /// The scopes of all the classes, in declaration order
  pub fn classes(&self) -> impl Iterator<Item = ScopeId> + '_ {
    (self[Self::GLOBAL].symbols()).filter_map(|symbol| match self[symbol].kind {
      SymbolKind::Class(scope) => Some(scope),
      _ => None,
    })
  }

  /// The methods of a class on one side, in declaration order
  pub fn methods(&self, class: ScopeId, class_side: bool) -> impl Iterator<Item = SymbolId> + '_ {
    (self[class].symbols()).filter(move |symbol| match self[*symbol].kind {
      SymbolKind::Method { class_side: side, .. }
      | SymbolKind::PrimitiveMethod { class_side: side, .. } => side == class_side,
      _ => false,
    })
  }

  /// All the fields of a class, inherited fields first
  #[must_use]
  pub fn fields(&self, class: ScopeId) -> Vec<SymbolId> {
    let mut chain = Vec::new();
    let mut current = Some(class);
    while let Some(class) = current {
      chain.push(class);
      current = self.superclass(class);
    }

    (chain.into_iter().rev())
      .flat_map(|class| self[class].symbols())
      .filter(|symbol| self[*symbol].kind == SymbolKind::Field)
      .collect()
  }

  /// The named method a scope is inside of, itself if it is a method
  #[must_use]
  pub fn enclosing_method(&self, scope: ScopeId) -> Option<ScopeId> {
    let mut current = Some(scope);
    while let Some(scope) = current {
      match self[scope].kind {
        ScopeKind::Method { .. } => return Some(scope),
        ScopeKind::Block { .. } => current = self[scope].enclosing,
        ScopeKind::Class { .. } | ScopeKind::Global => return None,
      }
    }
    None
  }

  /// The class a scope is inside of, itself if it is a class
  #[must_use]
  pub fn enclosing_class(&self, scope: ScopeId) -> Option<ScopeId> {
    let mut current = Some(scope);
    while let Some(scope) = current {
      if let ScopeKind::Class { .. } = self[scope].kind {
        return Some(scope);
      }
      current = self[scope].enclosing;
    }
    None
  }

  /// The number of environments between a scope and the scope a variable is declared in
  #[must_use]
  pub fn depth(&self, from: ScopeId, to: ScopeId) -> Option<u16> {
    let mut depth = 0;
    let mut current = from;
    while current != to {
      if !self[current].is_activation() {
        return None;
      }
      current = self[current].enclosing?;
      depth += 1;
    }
    Some(depth)
  }

  /// The name of a scope including all the scopes it is nested in, e.g. `T>>f>>block0`
  #[must_use]
  pub fn qualified_name(&self, scope: ScopeId) -> String {
    let mut names = Vec::new();
    let mut current = Some(scope);
    while let Some(scope) = current {
      if self[scope].kind != ScopeKind::Global {
        names.push(self[scope].name.as_str());
      }
      current = self[scope].enclosing;
    }

    let mut name = String::new();
    for (position, part) in names.into_iter().rev().enumerate() {
      if position > 0 {
        name.push_str(">>");
      }
      name.push_str(part);
    }
    name
  }

  /// Store the generated code for a method or block
  pub fn set_unit(&mut self, scope: ScopeId, unit: Rc<CompiledUnit>) {
    self.scopes[scope.position()].unit = Some(unit);
  }

  /// The generated code for a method with the given selector, searching superclasses
  #[must_use]
  pub fn method_unit(&self, class: &str, selector: &str, class_side: bool) -> Option<&Rc<CompiledUnit>> {
    let mut current = self.lookup_class(class);
    while let Some(class) = current {
      let method = (self[class].kind.methods(class_side)).and_then(|methods| methods.get(selector));
      if let Some(method) = method {
        return match self[*method].kind {
          SymbolKind::Method { scope, .. } => self[scope].unit.as_ref(),
          _ => None,
        };
      }
      current = self.superclass(class);
    }
    None
  }
}
impl Default for SymbolTable {
  fn default() -> Self {
    Self::new()
  }
}

impl ScopeKind {
  fn methods(&self, class_side: bool) -> Option<&HashMap<String, SymbolId>> {
    match self {
      Self::Class { methods, class_methods, .. } => {
        Some(if class_side { class_methods } else { methods })
      }
      _ => None,
    }
  }

  fn methods_mut(&mut self, class_side: bool) -> Option<&mut HashMap<String, SymbolId>> {
    match self {
      Self::Class { methods, class_methods, .. } => {
        Some(if class_side { class_methods } else { methods })
      }
      _ => None,
    }
  }
}

impl ScopeId {
  fn position(self) -> usize {
    self.0 as usize
  }
}
impl SymbolId {
  fn position(self) -> usize {
    self.0 as usize
  }
}

impl ops::Index<ScopeId> for SymbolTable {
  type Output = Scope;

  fn index(&self, index: ScopeId) -> &Self::Output {
    &self.scopes[index.position()]
  }
}
impl ops::Index<SymbolId> for SymbolTable {
  type Output = Symbol;

  fn index(&self, index: SymbolId) -> &Self::Output {
    &self.symbols[index.position()]
  }
}

impl fmt::Display for SymbolTable {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for class in self.classes() {
      let scope = &self[class];
      match self.superclass(class) {
        Some(superclass) => writeln!(f, "class {} : {}", scope.name, self[superclass].name)?,
        None => writeln!(f, "class {}", scope.name)?,
      }

      let fields: Vec<_> = (self.fields(class).into_iter())
        .map(|field| self[field].name.as_str())
        .collect();
      if !fields.is_empty() {
        writeln!(f, "  fields: {}", fields.join(" "))?;
      }

      for class_side in [false, true] {
        for method in self.methods(class, class_side) {
          let prefix = if class_side { "class " } else { "" };
          writeln!(f, "  {prefix}{}", self[method].name)?;
        }
      }
    }

    Ok(())
  }
}
