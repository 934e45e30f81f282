//! # Classes
//!
//! The runtime representation of classes, built from the symbol table once compilation
//! has finished and read-only afterwards.

use crate::{
  bytecode::CompiledUnit,
  collections::{HashMap, String},
  symbols::{SymbolKind, SymbolTable},
};
use std::{fmt, rc::Rc};

/// Classes searched when a method isn't found in the receiver's own class chain
const FALLBACK_CLASSES: [&str; 2] = ["Object", "Collection"];

/// The runtime object for a class
pub struct MetaClass {
  /// The name of the class
  pub name: String,
  /// The class methods are inherited from, `None` for the root class
  pub superclass: Option<Rc<MetaClass>>,
  /// The names of all the fields of an instance, inherited fields first
  pub fields: Vec<String>,
  /// Instance side methods declared directly in the class
  pub methods: HashMap<String, Rc<CompiledUnit>>,
  /// Class side methods declared directly in the class
  pub class_methods: HashMap<String, Rc<CompiledUnit>>,
}
impl MetaClass {
  /// Find a method in the class or its superclasses
  #[must_use]
  pub fn lookup(&self, selector: &str, class_side: bool) -> Option<Rc<CompiledUnit>> {
    let mut class = Some(self);
    while let Some(current) = class {
      let methods = if class_side { &current.class_methods } else { &current.methods };
      if let Some(method) = methods.get(selector) {
        return Some(method.clone());
      }
      class = current.superclass.as_deref();
    }
    None
  }
}
impl fmt::Debug for MetaClass {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("MetaClass")
      .field("name", &self.name)
      .field("superclass", &self.superclass.as_ref().map(|class| &class.name))
      .field("fields", &self.fields)
      .finish_non_exhaustive()
  }
}
impl fmt::Display for MetaClass {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.name)?;
    if let Some(superclass) = &self.superclass {
      write!(f, " : {}", superclass.name)?;
    }
    writeln!(f)?;

    if !self.fields.is_empty() {
      writeln!(f, "  fields: {}", self.fields.join(" "))?;
    }

    let mut selectors: Vec<_> = (self.methods.keys().map(|selector| (selector, "")))
      .chain(self.class_methods.keys().map(|selector| (selector, "class ")))
      .collect();
    selectors.sort_by(|(a, a_side), (b, b_side)| (a_side, a).cmp(&(b_side, b)));

    for (selector, side) in selectors {
      writeln!(f, "  {side}{selector}")?;
    }

    Ok(())
  }
}

/// All the classes of a program, by name
#[derive(Debug, Default)]
pub struct ClassTable {
  classes: Vec<Rc<MetaClass>>,
  by_name: HashMap<String, usize>,
}
impl ClassTable {
  /// Build the runtime classes from a compiled program.
  ///
  /// Methods whose code wasn't generated, due to compile errors, are left out.
  #[must_use]
  pub fn from_symbols(symbols: &SymbolTable) -> Self {
    let mut table = Self::default();

    for class in symbols.classes() {
      let scope = &symbols[class];
      let name = scope.name.clone();
      let superclass = (symbols.superclass(class))
        .and_then(|superclass| table.get(&symbols[superclass].name))
        .cloned();

      let fields = (symbols.fields(class).into_iter())
        .map(|field| symbols[field].name.clone())
        .collect();

      let mut sides = [HashMap::default(), HashMap::default()];
      for (class_side, methods) in [false, true].into_iter().zip(sides.iter_mut()) {
        for method in symbols.methods(class, class_side) {
          let symbol = &symbols[method];
          let unit = match &symbol.kind {
            SymbolKind::Method { scope, .. } => symbols[*scope].unit.clone(),
            SymbolKind::PrimitiveMethod {
              primitive,
              arguments,
              ..
            } => Some(Rc::new(CompiledUnit::primitive(
              format!("{name}>>{}", symbol.name).into(),
              name.clone(),
              *primitive,
              *arguments,
              class_side,
            ))),
            _ => None,
          };

          if let Some(unit) = unit {
            methods.insert(symbol.name.clone(), unit);
          }
        }
      }
      let [methods, class_methods] = sides;

      log::trace!("built class {name}");
      table.insert(MetaClass {
        name,
        superclass,
        fields,
        methods,
        class_methods,
      });
    }

    log::debug!("built class table with {} classes", table.classes.len());
    table
  }

  fn insert(&mut self, class: MetaClass) {
    self.by_name.insert(class.name.clone(), self.classes.len());
    self.classes.push(Rc::new(class));
  }

  /// Get a class by name
  #[must_use]
  pub fn get(&self, name: &str) -> Option<&Rc<MetaClass>> {
    self.by_name.get(name).map(|index| &self.classes[*index])
  }

  /// The classes, in declaration order
  pub fn iter(&self) -> impl Iterator<Item = &Rc<MetaClass>> {
    self.classes.iter()
  }

  /// The number of classes
  #[must_use]
  pub fn len(&self) -> usize {
    self.classes.len()
  }

  /// Are there no classes?
  #[must_use]
  pub fn is_empty(&self) -> bool {
    self.classes.is_empty()
  }

  /// Find a method for a message, searching the class chain and then the fallback
  /// classes shared by all objects and collections
  #[must_use]
  pub fn find_method(
    &self,
    class: Option<&MetaClass>,
    selector: &str,
    class_side: bool,
  ) -> Option<Rc<CompiledUnit>> {
    if let Some(method) = class.and_then(|class| class.lookup(selector, class_side)) {
      return Some(method);
    }

    (FALLBACK_CLASSES.iter())
      .filter_map(|name| self.get(name))
      .find_map(|class| class.lookup(selector, class_side))
  }
}
impl fmt::Display for ClassTable {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for class in &self.classes {
      write!(f, "{class}")?;
    }
    Ok(())
  }
}
