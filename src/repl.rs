//! Line-oriented prompt over a resumable session.
//!
//! Each input line is one submission against the same session key. Lines
//! starting with `:` are prompt commands.

use std::io::{self, BufRead, Write};
use std::sync::Arc;

use tracing::debug;

use crate::backend::Backend;
use crate::execution::ScriptExecutor;
use crate::host::ScriptPack;
use crate::session::SessionKey;
use crate::ScriptError;

const PROMPT: &str = "> ";

/// Prompt command parsed from an input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command<'a> {
    /// Source text to submit.
    Submit(&'a str),
    /// `:vars`
    Variables,
    /// `:quit` or `:q`
    Quit,
    /// Blank line.
    Empty,
    /// Unrecognized `:` command.
    Unknown(&'a str),
}

impl<'a> Command<'a> {
    pub fn parse(line: &'a str) -> Self {
        let line = line.trim();
        match line {
            "" => Self::Empty,
            ":vars" => Self::Variables,
            ":quit" | ":q" => Self::Quit,
            cmd if cmd.starts_with(':') => Self::Unknown(cmd),
            code => Self::Submit(code),
        }
    }
}

/// Interactive loop reading from `input` and writing to `output`.
pub struct Repl<'e, B: Backend> {
    executor: &'e ScriptExecutor<B>,
    key: SessionKey,
    args: Vec<String>,
    packs: Vec<Arc<dyn ScriptPack>>,
}

impl<'e, B: Backend> Repl<'e, B> {
    pub fn new(executor: &'e ScriptExecutor<B>, key: SessionKey) -> Self {
        Self {
            executor,
            key,
            args: Vec::new(),
            packs: Vec::new(),
        }
    }

    /// Arguments visible to every submission.
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    /// Packs visible to every submission.
    pub fn with_packs(mut self, packs: Vec<Arc<dyn ScriptPack>>) -> Self {
        self.packs = packs;
        self
    }

    pub fn key(&self) -> &SessionKey {
        &self.key
    }

    /// Run until `:quit` or end of input.
    ///
    /// Script errors are reported on `output` and do not end the loop.
    pub fn run<R: BufRead, W: Write>(&self, input: R, mut output: W) -> io::Result<()> {
        write!(output, "{}", PROMPT)?;
        output.flush()?;

        for line in input.lines() {
            let line = line?;
            match Command::parse(&line) {
                Command::Quit => break,
                Command::Empty => {}
                Command::Variables => {
                    for variable in self.executor.list_variables(&self.key) {
                        writeln!(output, "{}", variable)?;
                    }
                }
                Command::Unknown(cmd) => {
                    writeln!(output, "unknown command: {}", cmd)?;
                }
                Command::Submit(code) => self.submit(code, &mut output)?,
            }
            write!(output, "{}", PROMPT)?;
            output.flush()?;
        }

        writeln!(output)?;
        Ok(())
    }

    fn submit<W: Write>(&self, code: &str, output: &mut W) -> io::Result<()> {
        match self
            .executor
            .execute_code(code, &self.args, &self.packs, Some(&self.key))
        {
            Ok(result) => {
                for diagnostic in &result.diagnostics {
                    writeln!(output, "{}", diagnostic)?;
                }
                if result.has_value() {
                    writeln!(output, "{}", result.value)?;
                }
            }
            Err(ScriptError::Compilation { diagnostics }) => {
                for diagnostic in diagnostics {
                    writeln!(output, "{}", diagnostic)?;
                }
            }
            Err(e) => {
                debug!(error = %e, "submission failed");
                writeln!(output, "error: {}", e)?;
            }
        }
        Ok(())
    }
}
