//! REPL (Read-Eval-Print Loop) for Kestrel

use crate::ast::Stmt;
use crate::config::RuntimeConfig;
use crate::interp::{InterpResult, Interpreter, Value};
use crate::parser::parse_source;
use rustyline::error::ReadlineError;
use rustyline::{DefaultEditor, Result as RlResult};
use std::path::PathBuf;

const PROMPT: &str = "> ";
const HISTORY_FILE: &str = ".kestrel_history";
const REPL_FILE: &str = "<repl>";

/// Interpreter state shared by every line of a session
pub struct Session {
    interpreter: Interpreter,
    lines: usize,
}

impl Session {
    pub fn new(interpreter: Interpreter) -> Self {
        Session {
            interpreter,
            lines: 0,
        }
    }

    pub fn interpreter(&self) -> &Interpreter {
        &self.interpreter
    }

    /// Evaluate one line. A lone expression yields its printed value; anything
    /// else runs as top-level statements and yields `None`.
    pub fn eval_line(&mut self, input: &str) -> InterpResult<Option<String>> {
        self.lines += 1;
        let name = format!("repl{}", self.lines);
        let result = self.eval_parsed(&name, input);
        if result.is_err() {
            self.interpreter.reset();
        }
        result
    }

    fn eval_parsed(&mut self, name: &str, input: &str) -> InterpResult<Option<String>> {
        if !input.ends_with(';') && !input.ends_with('}') {
            let as_statement = format!("{input};");
            if let Ok(module) = parse_source(name, REPL_FILE, &as_statement)
                && module.functions.is_empty()
                && let [stmt] = module.body.as_slice()
                && let Stmt::Expr(expr) = &stmt.node
            {
                let value = self.interpreter.eval_expr(REPL_FILE, expr)?;
                return Ok(match value {
                    Value::Nil | Value::Null => None,
                    other => Some(self.interpreter.env().display(&other)),
                });
            }
        }
        let module = parse_source(name, REPL_FILE, input)?;
        self.interpreter.run_module(module)?;
        Ok(None)
    }

    /// One line per installed module for `:modules`
    pub fn modules_summary(&self) -> Vec<String> {
        let mut entries: Vec<_> = self.interpreter.env().modules().collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        entries
            .into_iter()
            .map(|entry| {
                let functions = entry.module.functions.len();
                let plural = if functions == 1 { "" } else { "s" };
                format!("{} ({}): {functions} function{plural}", entry.name, entry.module.file)
            })
            .collect()
    }

    /// Summary of collector activity for `:gc`
    pub fn gc_summary(&self) -> String {
        let stats = self.interpreter.env().gc_stats();
        format!(
            "live: {}, collections: {}, allocated: {}, freed: {}, peak: {}",
            self.interpreter.env().heap().live_objects(),
            stats.collections,
            stats.allocated,
            stats.freed,
            stats.peak_live
        )
    }
}

/// REPL state
pub struct Repl {
    editor: DefaultEditor,
    session: Session,
    history_path: Option<PathBuf>,
}

impl Repl {
    pub fn new(config: RuntimeConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let editor = DefaultEditor::new()?;
        let interpreter = Interpreter::new(config)?;
        let history_path = std::env::var_os("HOME").map(|home| PathBuf::from(home).join(HISTORY_FILE));

        let mut repl = Repl {
            editor,
            session: Session::new(interpreter),
            history_path,
        };
        if let Some(path) = &repl.history_path {
            let _ = repl.editor.load_history(path);
        }
        Ok(repl)
    }

    /// Run until `:quit` or end of input
    pub fn run(&mut self) -> RlResult<()> {
        println!("Kestrel REPL v{}", env!("CARGO_PKG_VERSION"));
        println!("Type :help for help, :quit to exit.\n");

        loop {
            match self.editor.readline(PROMPT) {
                Ok(line) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    let _ = self.editor.add_history_entry(line);

                    if line.starts_with(':') {
                        if self.handle_command(line) {
                            break;
                        }
                        continue;
                    }

                    match self.session.eval_line(line) {
                        Ok(Some(value)) => println!("{value}"),
                        Ok(None) => {}
                        Err(err) => eprintln!("{err}"),
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    println!("^C");
                }
                Err(ReadlineError::Eof) => break,
                Err(err) => {
                    eprintln!("Error: {err}");
                    break;
                }
            }
        }

        if let Some(path) = &self.history_path {
            let _ = self.editor.save_history(path);
        }
        Ok(())
    }

    /// Handle `:` commands; true means exit
    fn handle_command(&mut self, cmd: &str) -> bool {
        match cmd {
            ":quit" | ":q" | ":exit" => true,
            ":help" | ":h" | ":?" => {
                print_help();
                false
            }
            ":gc" => {
                println!("{}", self.session.gc_summary());
                false
            }
            ":modules" | ":m" => {
                for line in self.session.modules_summary() {
                    println!("{line}");
                }
                false
            }
            ":clear" => {
                print!("\x1B[2J\x1B[1;1H");
                false
            }
            _ => {
                println!("Unknown command: {cmd}");
                println!("Type :help for help.");
                false
            }
        }
    }
}

fn print_help() {
    println!("Commands:");
    println!("  :help, :h, :?   Show this help");
    println!("  :quit, :q       Exit the REPL");
    println!("  :modules, :m    List installed modules");
    println!("  :gc             Show collector statistics");
    println!("  :clear          Clear the screen");
    println!();
    println!("Enter an expression to print its value, or statements and");
    println!("`func` definitions ending in ';' or '}}' to run them.");
}
