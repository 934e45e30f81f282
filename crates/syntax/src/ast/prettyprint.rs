//! Pretty-print the AST into a human readable format.
//!
//! Based upon this [blog post](https://www.georgevreilly.com/blog/2023/01/24/TreeInRust2PrintingTrees.html)

use super::{AST, Body, ClassDefinition, Method, MethodBody, expression::*, statement::*};
use std::fmt;

impl fmt::Display for AST {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    for class in &self.classes {
      class.pretty(f, self, "", false)?;
    }

    if self.has_main() {
      writeln!(f, "Main")?;
      self.main.pretty(f, self, "", true)?;
    }

    Ok(())
  }
}

const OTHER_CHILD: &str = "│  ";
const OTHER_ENTRY: &str = "├─ ";
const FINAL_CHILD: &str = "   ";
const FINAL_ENTRY: &str = "╰─ ";

trait PrettyPrint {
  fn pretty(&self, f: &mut fmt::Formatter, ast: &AST, prefix: &str, last: bool) -> fmt::Result;
}

fn child_prefix(prefix: &str, last: bool) -> String {
  format!("{prefix}{}", if last { FINAL_CHILD } else { OTHER_CHILD })
}

fn connector(last: bool) -> &'static str {
  if last { FINAL_ENTRY } else { OTHER_ENTRY }
}

impl PrettyPrint for ClassDefinition {
  fn pretty(&self, f: &mut fmt::Formatter, ast: &AST, _prefix: &str, _last: bool) -> fmt::Result {
    match &self.superclass {
      Some(superclass) => writeln!(f, "Class {} : {}", self.name(ast), superclass.name(ast))?,
      None => writeln!(f, "Class {}", self.name(ast))?,
    }

    let has_methods = !self.methods.is_empty();
    if !self.fields.is_empty() {
      let fields: Vec<_> = self.fields().map(|field| field.name(ast)).collect();
      writeln!(f, "{}Fields ({})", connector(!has_methods), fields.join(" "))?;
    }

    let (last_method, methods) = match self.methods.split_last() {
      Some(split) => split,
      None => return Ok(()),
    };
    for method in methods {
      ast[*method].pretty(f, ast, "", false)?;
    }
    ast[*last_method].pretty(f, ast, "", true)
  }
}
impl PrettyPrint for Method {
  fn pretty(&self, f: &mut fmt::Formatter, ast: &AST, prefix: &str, last: bool) -> fmt::Result {
    let side = if self.is_class_method() { "Class Method" } else { "Method" };
    let parameters: Vec<_> = self.parameters().map(|p| p.name(ast)).collect();
    write!(f, "{prefix}{}{side} {}", connector(last), self.selector(ast))?;
    if parameters.is_empty() {
      writeln!(f)?;
    } else {
      writeln!(f, " ({})", parameters.join(" "))?;
    }

    let prefix = child_prefix(prefix, last);
    match &self.body {
      MethodBody::Code(body) => body.pretty(f, ast, &prefix, true),
      MethodBody::Primitive { .. } => {
        let name = self.body.primitive_name(ast).unwrap_or_default();
        writeln!(f, "{prefix}{FINAL_ENTRY}Primitive ({name})")
      }
    }
  }
}
impl PrettyPrint for Body {
  fn pretty(&self, f: &mut fmt::Formatter, ast: &AST, prefix: &str, _last: bool) -> fmt::Result {
    if !self.locals.is_empty() {
      let locals: Vec<_> = self.locals().map(|local| local.name(ast)).collect();
      let last = self.statements.is_empty();
      writeln!(f, "{prefix}{}Locals ({})", connector(last), locals.join(" "))?;
    }

    let (last_statement, statements) = match self.statements.split_last() {
      Some(split) => split,
      None => return Ok(()),
    };
    for statement in statements {
      ast[*statement].pretty(f, ast, prefix, false)?;
    }
    ast[*last_statement].pretty(f, ast, prefix, true)
  }
}

impl PrettyPrint for Statement {
  fn pretty(&self, f: &mut fmt::Formatter, ast: &AST, prefix: &str, last: bool) -> fmt::Result {
    let new_prefix = child_prefix(prefix, last);

    match self {
      Self::Assignment(assignment) => {
        let name = assignment.target.name(ast);
        writeln!(f, "{prefix}{}Assignment ({name})", connector(last))?;
        ast[assignment.expression].pretty(f, ast, &new_prefix, true)
      }
      Self::Return(return_) => {
        writeln!(f, "{prefix}{}Return", connector(last))?;
        ast[return_.expression].pretty(f, ast, &new_prefix, true)
      }
      Self::Expression(expression) => ast[expression.expression].pretty(f, ast, prefix, last),
    }
  }
}

impl PrettyPrint for Expression {
  fn pretty(&self, f: &mut fmt::Formatter, ast: &AST, prefix: &str, last: bool) -> fmt::Result {
    let entry = connector(last);
    let new_prefix = child_prefix(prefix, last);

    match self {
      Self::Array(array) => {
        writeln!(f, "{prefix}{entry}Array")?;
        print_children(f, ast, &new_prefix, array.items())
      }
      Self::Block(block) => {
        let parameters: Vec<_> = block.parameters().map(|p| p.name(ast)).collect();
        if parameters.is_empty() {
          writeln!(f, "{prefix}{entry}Block")?;
        } else {
          writeln!(f, "{prefix}{entry}Block ({})", parameters.join(" "))?;
        }
        block.body.pretty(f, ast, &new_prefix, true)
      }
      Self::Group(group) => {
        writeln!(f, "{prefix}{entry}Group")?;
        ast[group.expression].pretty(f, ast, &new_prefix, true)
      }
      Self::Literal(literal) => match &literal.kind {
        LiteralKind::Nil => writeln!(f, "{prefix}{entry}Nil"),
        LiteralKind::True => writeln!(f, "{prefix}{entry}Boolean (true)"),
        LiteralKind::False => writeln!(f, "{prefix}{entry}Boolean (false)"),
        LiteralKind::SelfReference => writeln!(f, "{prefix}{entry}Self"),
        LiteralKind::Integer(value) => writeln!(f, "{prefix}{entry}Integer ({value})"),
        LiteralKind::Float(value) => writeln!(f, "{prefix}{entry}Float ({value})"),
        LiteralKind::Character(value) => writeln!(f, "{prefix}{entry}Character (${value})"),
        LiteralKind::String(value) => writeln!(f, "{prefix}{entry}String '{value}'"),
        LiteralKind::Symbol(value) => writeln!(f, "{prefix}{entry}Symbol #{value}"),
      },
      Self::Unary(unary) => {
        writeln!(f, "{prefix}{entry}Unary Send ({})", unary.selector(ast))?;
        ast[unary.receiver].pretty(f, ast, &new_prefix, true)
      }
      Self::Binary(binary) => {
        writeln!(f, "{prefix}{entry}Binary Send ({})", binary.operator(ast))?;
        ast[binary.receiver].pretty(f, ast, &new_prefix, false)?;
        ast[binary.argument].pretty(f, ast, &new_prefix, true)
      }
      Self::Keyword(keyword) => {
        writeln!(f, "{prefix}{entry}Keyword Send ({})", keyword.selector(ast))?;
        ast[keyword.receiver].pretty(f, ast, &new_prefix, keyword.parts.is_empty())?;
        print_children(f, ast, &new_prefix, keyword.arguments())
      }
      Self::Super(_) => writeln!(f, "{prefix}{entry}Super"),
      Self::Variable(variable) => writeln!(f, "{prefix}{entry}Variable ({})", variable.name(ast)),
      Self::Invalid(_) => writeln!(f, "{prefix}{entry}Invalid"),
    }
  }
}

fn print_children(
  f: &mut fmt::Formatter,
  ast: &AST,
  prefix: &str,
  children: impl ExactSizeIterator<Item = super::ExpressionIdx>,
) -> fmt::Result {
  let count = children.len();
  for (index, child) in children.enumerate() {
    ast[child].pretty(f, ast, prefix, index + 1 == count)?;
  }
  Ok(())
}
