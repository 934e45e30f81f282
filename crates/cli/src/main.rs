//! # Smalltalk
//! Run programs written in a small dialect of Smalltalk.
//!
//! The standard classes and the program are compiled to bytecode, then the top-level
//! statements are run on a virtual machine. Debug views of each stage are available.

#![allow(clippy::print_stdout)]

mod commands;
mod diagnostics;

use clap::builder::styling::{AnsiColor, Style, Styles};
use clap::{Args, Parser, Subcommand};
use commands::CommandStatus;
use owo_colors::*;
use smalltalk_interpreter::CompileOptions;
use std::process;

const STYLES: Styles = Styles::styled()
  .usage(Style::new().italic())
  .header(AnsiColor::BrightYellow.on_default().bold());

fn coloured_header() -> String {
  format!(
    "{} {}",
    "Smalltalk".fg::<owo_colors::colors::css::Orange>().bold(),
    format!("(v{})", env!("CARGO_PKG_VERSION")).italic().dimmed()
  )
}

fn about() -> String {
  format!(
    "{}\nA bytecode compiler and virtual machine for a subset of Smalltalk.",
    coloured_header()
  )
}

#[derive(Parser)]
#[clap(
  name = "smalltalk",
  version,
  about = about(),
  styles = STYLES,
  disable_help_subcommand = true,
)]
enum App {
  /// Runs a Smalltalk program
  Run {
    /// The file to run, `-` to read from stdin
    file: String,
    #[command(flatten)]
    options: CompileFlags,
  },

  /// Prints debugging information
  Print {
    #[command(subcommand)]
    command: PrintCommand,
  },
}

#[derive(Args)]
struct CompileFlags {
  /// Don't record source locations, tracebacks won't have line numbers
  #[clap(long)]
  no_debug: bool,
  /// Don't compile the standard classes before the program
  #[clap(long)]
  no_image: bool,
}
impl CompileFlags {
  fn options(&self, file: &str) -> CompileOptions {
    CompileOptions {
      file_name: commands::display_name(file).to_owned(),
      debug_markers: !self.no_debug,
      load_image: !self.no_image,
    }
  }
}

#[derive(Subcommand)]
enum PrintCommand {
  /// Displays the tokens in the file
  Tokens {
    /// The file to print
    file: String,
  },
  /// Displays the Abstract Syntax Tree
  Ast {
    /// The file to print
    file: String,
  },
  /// Displays the bytecode of the classes and statements in the file
  Bytecode {
    /// The file to print
    file: String,
    #[command(flatten)]
    options: CompileFlags,
  },
  /// Displays every class, including the standard classes
  Classes {
    /// The file to print
    file: String,
    #[command(flatten)]
    options: CompileFlags,
  },
}

fn main() -> process::ExitCode {
  env_logger::init();
  let args = App::parse();

  let result = match args {
    App::Run { file, options } => commands::run(&file, options.options(&file)),
    App::Print { command } => match command {
      PrintCommand::Tokens { file } => commands::print_tokens(&file),
      PrintCommand::Ast { file } => commands::print_ast(&file),
      PrintCommand::Bytecode { file, options } => {
        commands::print_bytecode(&file, options.options(&file))
      }
      PrintCommand::Classes { file, options } => {
        commands::print_classes(&file, options.options(&file))
      }
    },
  };

  match result {
    Ok(CommandStatus::Success) => process::ExitCode::from(0),
    Ok(CommandStatus::Failure) => process::ExitCode::from(1),
    Err(()) => process::ExitCode::from(2),
  }
}
