//! The pipeline execution engine: resolves redirections, dispatches
//! built-ins, wires pipes across the stages of one parsed command, spawns
//! them, and hands the spawned set to the job controller.

use std::io;
use std::process::{Child, Command as Process, Stdio};

use crate::ast;
use crate::builtins::{self, BuiltinAction};
use crate::errors;
use crate::jobs;
use crate::redirect;

/// Execute one parsed command. The only entry point the rest of the shell
/// calls; all failures are reported here or below, never propagated.
pub fn execute(command: &ast::Command) -> BuiltinAction {
    let external = match redirect::resolve(
        command.stdin_path.as_deref(),
        command.stdout_path.as_deref(),
    ) {
        Ok(external) => external,
        Err(message) => {
            eprintln!("{message}");
            return BuiltinAction::Continue;
        }
    };

    // Built-ins run inside the shell process and are only meaningful as the
    // sole stage: in a pipeline, exit would strand already-spawned siblings
    // and cd would occupy a pipe slot to no effect. Such commands are
    // rejected before anything is spawned.
    if command.stages.len() == 1 && builtins::is_builtin(command.stages[0].program()) {
        return builtins::execute(&command.stages[0].argv);
    }
    if let Some(stage) = command
        .stages
        .iter()
        .find(|stage| builtins::is_builtin(stage.program()))
    {
        eprintln!(
            "tsh: {}: built-ins cannot be part of a pipeline",
            stage.program()
        );
        return BuiltinAction::Continue;
    }

    let children = spawn_pipeline(&command.stages, external);

    if command.background {
        // Detached: the process-wide child-termination disposition reaps
        // these children; the shell returns to its prompt without waiting.
        drop(children);
    } else {
        jobs::wait_foreground(children);
    }

    BuiltinAction::Continue
}

/// Spawn every stage in one left-to-right pass, wiring each stage's
/// stdin/stdout to the previous pipe, a fresh pipe, or an external
/// endpoint. Returns the children in spawn order.
///
/// Endpoint handles are moved into each spawn call and dropped with it, so
/// the parent never keeps a pipe end it does not own and EOF propagates
/// down the chain.
fn spawn_pipeline(stages: &[ast::Stage], external: redirect::ExternalIo) -> Vec<Child> {
    let redirect::ExternalIo { input, mut output } = external;
    let mut children: Vec<Child> = Vec::with_capacity(stages.len());

    // What the next stage reads: the external input for the first stage,
    // then the read end of each fresh pipe. `None` inherits the shell's
    // own stdin.
    let mut next_stdin: Option<Stdio> = input.map(Stdio::from);

    for (index, stage) in stages.iter().enumerate() {
        let on_last_stage = index + 1 == stages.len();

        let (stdout, next_reader) = if on_last_stage {
            (output.take().map(Stdio::from), None)
        } else {
            match os_pipe::pipe() {
                Ok((reader, writer)) => (Some(Stdio::from(writer)), Some(reader)),
                Err(err) => {
                    eprintln!("tsh: could not create pipe: {err}");
                    // Stages spawned so far must not be left orphaned:
                    // terminate and collect them before abandoning the
                    // command.
                    jobs::reap_aborted(&mut children);
                    return children;
                }
            }
        };

        match spawn_stage(stage, next_stdin.take(), stdout) {
            Ok(child) => children.push(child),
            Err(err) => {
                // The stage never ran. Its endpoints drop right here, so
                // neighbouring stages see EOF instead of a hung pipe;
                // siblings and the shell continue.
                eprintln!("{}", errors::exec_message(&err, stage.program()));
            }
        }

        next_stdin = next_reader.map(Stdio::from);
    }

    children
}

/// Spawn one external stage with the planned endpoints installed as its
/// standard streams.
fn spawn_stage(
    stage: &ast::Stage,
    stdin: Option<Stdio>,
    stdout: Option<Stdio>,
) -> io::Result<Child> {
    let mut process = Process::new(stage.program());
    process.args(stage.args());

    if let Some(stdin) = stdin {
        process.stdin(stdin);
    }
    if let Some(stdout) = stdout {
        process.stdout(stdout);
    }

    // Cancellation reaches pipeline children through the shell killing the
    // registered pids, not through terminal signal delivery, so each child
    // drops out of interactive SIGINT handling before exec.
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        unsafe {
            process.pre_exec(disable_interactive_cancellation);
        }
    }

    process.spawn()
}

/// Runs in the child between fork and exec; async-signal-safe only.
#[cfg(unix)]
fn disable_interactive_cancellation() -> io::Result<()> {
    unsafe {
        libc::signal(libc::SIGINT, libc::SIG_IGN);
    }
    Ok(())
}
