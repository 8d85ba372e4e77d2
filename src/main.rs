mod ast;
mod builtins;
mod editor;
mod errors;
mod executor;
mod jobs;
mod parser;
mod redirect;

use std::io::{self, Write};
use std::sync::atomic::Ordering;

use crate::builtins::BuiltinAction;

fn main() {
    // Detached background children are collected by the OS from here on;
    // the engine never issues a wait for them.
    jobs::configure_child_auto_reap();

    // Installed once for the life of the shell. With no foreground job
    // registered this only refreshes the prompt line, so the shell itself
    // is uninterruptible while idle at its prompt.
    ctrlc::set_handler(|| {
        jobs::terminate_foreground();
        if !editor::EDITOR_ACTIVE.load(Ordering::Relaxed) {
            println!();
            let _ = io::stdout().flush();
        }
    })
    .expect("Failed to set Ctrl-C handler");

    let mut editor = editor::LineEditor::new();

    loop {
        let line = match editor.read_line("tsh> ") {
            Ok(Some(line)) => line,
            Ok(None) => break, // EOF ends the shell
            Err(e) => {
                eprintln!("tsh: error reading input: {e}");
                break;
            }
        };

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        editor.add_to_history(trimmed);

        match parser::parse(trimmed) {
            Ok(command) => {
                if executor::execute(&command) == BuiltinAction::Exit {
                    break;
                }
            }
            Err(message) => eprintln!("tsh: {message}"),
        }
    }
}
