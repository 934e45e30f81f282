use super::diagnostics::{CodeFrame, Message};

use smalltalk_interpreter::{
  Compilation, CompileOptions, MAIN_CLASS, MAIN_METHOD, RuntimeError, VM, compile_with,
};
use smalltalk_syntax::{AST, Location, Span, tokenise};

use anstream::{eprintln, print, println};
use std::fs;

pub enum CommandStatus {
  /// Command was successful
  Success,
  /// The program ran, but stopped with an error
  Failure,
}

/// The name to show for a file, stdin is given as `-`
pub fn display_name(filename: &str) -> &str {
  if filename == "-" { "STDIN" } else { filename }
}

fn read_file(filename: &str) -> Result<String, ()> {
  if filename == "-" {
    return read_stdin();
  }

  match fs::read_to_string(filename) {
    Ok(file) if file.is_empty() => {
      eprintln!("{}", Message::warning(format!("Empty file `{filename}`")));
      Err(())
    }
    Ok(file) if u32::try_from(file.len()).is_err() => {
      eprintln!("{}", Message::error("File too large - max size 4GB".into()));
      Err(())
    }
    Ok(file) => Ok(file),
    Err(_) => {
      eprintln!("{}", Message::error(format!("File not found `{filename}`")));
      Err(())
    }
  }
}

fn read_stdin() -> Result<String, ()> {
  use std::io::{self, Read};

  let mut buffer = Vec::new();
  let mut stdin = io::stdin().lock();

  match stdin.read_to_end(&mut buffer) {
    Ok(_) if u32::try_from(buffer.len()).is_err() => {
      eprintln!("{}", Message::error("File too large - max size 4GB".into()));
      Err(())
    }
    Ok(_) => String::from_utf8(buffer).map_err(|_| {
      eprintln!("{}", Message::error("STDIN is not valid UTF-8".into()));
    }),
    Err(_) => {
      eprintln!("{}", Message::error("Problem Reading from STDIN".into()));
      Err(())
    }
  }
}

fn parse(filename: &str, source: String) -> Result<AST, ()> {
  let ast = smalltalk_syntax::parse(source);
  log::debug!("parsed {} into {} tokens", display_name(filename), ast.tokens.len());

  if ast.is_valid() {
    Ok(ast)
  } else {
    for error in &ast.errors {
      eprintln!("{}", Message::from(error));
      eprintln!("{}", CodeFrame::new(filename, &ast.source, error.span()));
    }
    Err(())
  }
}

fn compile(filename: &str, ast: &AST, options: CompileOptions) -> Result<Compilation, ()> {
  let compilation = compile_with(ast, options);

  if compilation.is_valid() {
    Ok(compilation)
  } else {
    for error in &compilation.errors {
      eprintln!("{}", Message::from(error));
      eprintln!("{}", CodeFrame::new(filename, &ast.source, error.span()));
    }
    Err(())
  }
}

pub fn run(filename: &str, options: CompileOptions) -> Result<CommandStatus, ()> {
  let source = read_file(filename)?;
  let ast = parse(filename, source)?;
  let file_name = options.file_name.clone();
  let compilation = compile(filename, &ast, options)?;

  let mut vm = VM::new(compilation.class_table());
  match vm.run(MAIN_CLASS) {
    Ok(value) => {
      println!("{value}");
      Ok(CommandStatus::Success)
    }
    Err(error) => {
      log::debug!("{} stopped with an error, {}", display_name(filename), error.title());
      report_runtime_error(filename, &file_name, &ast, &error);
      Ok(CommandStatus::Failure)
    }
  }
}

fn report_runtime_error(filename: &str, file_name: &str, ast: &AST, error: &RuntimeError) {
  eprintln!("{}", Message::from(error));

  // the innermost frame may be in the standard image, so show the program's code
  let position = (error.frames().iter())
    .filter_map(|frame| frame.position.as_ref())
    .find(|(file, ..)| file == file_name)
    .and_then(|(_, line, column)| {
      let location = Location {
        line: u32::from(*line),
        column: u32::from(*column),
      };
      ast.line_index().offset(location).map(Span::at)
    });
  if let Some(span) = position {
    eprintln!("{}\n", CodeFrame::new(filename, &ast.source, span));
  }

  if let Some(traceback) = error.traceback() {
    eprintln!("{traceback}");
  }
}

pub fn print_tokens(filename: &str) -> Result<CommandStatus, ()> {
  let source = read_file(filename)?;

  println!("    ╭─[Tokens: {}]", display_name(filename));
  for token in tokenise(&source) {
    print!("{:>3} │ {}", token.start, token.kind);
    if !token.kind.has_fixed_length() {
      print!(" (length: {})", token.length);
    }
    println!();
  }
  println!("────╯");

  Ok(CommandStatus::Success)
}

pub fn print_ast(filename: &str) -> Result<CommandStatus, ()> {
  let source = read_file(filename)?;
  let ast = smalltalk_syntax::parse(source);

  if !ast.is_valid() {
    for error in &ast.errors {
      eprintln!("{}", Message::from(error));
      eprintln!("{}", CodeFrame::new(filename, &ast.source, error.span()));
    }
    println!();
  }

  println!("╭─[Abstract Syntax Tree: {}]", display_name(filename));
  print!("{ast}");
  println!("╯");

  Ok(CommandStatus::Success)
}

pub fn print_bytecode(filename: &str, options: CompileOptions) -> Result<CommandStatus, ()> {
  let source = read_file(filename)?;
  let ast = parse(filename, source)?;
  let compilation = compile(filename, &ast, options)?;

  for (_, class) in ast.class_definitions() {
    for unit in compilation.class_units(class.name(&ast)) {
      print!("{unit}");
    }
  }

  if let Some(main) = compilation.unit(MAIN_CLASS, MAIN_METHOD) {
    print!("{main}");
  }

  Ok(CommandStatus::Success)
}

pub fn print_classes(filename: &str, options: CompileOptions) -> Result<CommandStatus, ()> {
  let source = read_file(filename)?;
  let ast = parse(filename, source)?;
  let compilation = compile(filename, &ast, options)?;

  print!("{}", compilation.class_table());

  Ok(CommandStatus::Success)
}
