use std::io::{self, BufRead, Write};

/// Where prompt input comes from.
///
/// Production reads one line from stdin after printing the prompt;
/// tests queue scripted lines instead.
pub trait LineSource {
    /// Show `prompt` (no trailing newline) and read one line of input.
    /// The returned line has its trailing newline stripped.
    fn read_line(&mut self, prompt: &str) -> io::Result<String>;
}

/// Interactive prompter over stdin/stdout.
pub struct StdinPrompter;

impl StdinPrompter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for StdinPrompter {
    fn default() -> Self {
        Self::new()
    }
}

impl LineSource for StdinPrompter {
    fn read_line(&mut self, prompt: &str) -> io::Result<String> {
        let mut stdout = io::stdout().lock();
        stdout.write_all(prompt.as_bytes())?;
        stdout.flush()?;

        let mut line = String::new();
        let n = io::stdin().lock().read_line(&mut line)?;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "stdin closed while waiting for input",
            ));
        }
        while line.ends_with('\n') || line.ends_with('\r') {
            line.pop();
        }
        Ok(line)
    }
}

/// Scripted input for tests: pops queued lines in order and records every
/// prompt it was shown.
#[cfg(test)]
pub struct QueuedLines {
    lines: std::collections::VecDeque<String>,
    pub prompts: Vec<String>,
}

#[cfg(test)]
impl QueuedLines {
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
            prompts: Vec::new(),
        }
    }
}

#[cfg(test)]
impl LineSource for QueuedLines {
    fn read_line(&mut self, prompt: &str) -> io::Result<String> {
        self.prompts.push(prompt.to_string());
        self.lines.pop_front().ok_or_else(|| {
            io::Error::new(io::ErrorKind::UnexpectedEof, "no more queued input")
        })
    }
}
