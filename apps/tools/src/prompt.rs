use std::io::{self, Write};

use study_core::{Prompt, UserPrompt};

/// Reads one line from stdin; `None` at end of input.
pub fn read_line() -> io::Result<Option<String>> {
    let mut line = String::new();
    if io::stdin().read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
}

/// Asks on the terminal; `assume_yes` answers every question with yes.
pub struct TerminalPrompt {
    assume_yes: bool,
}

impl TerminalPrompt {
    pub fn new(assume_yes: bool) -> Self {
        Self { assume_yes }
    }
}

impl UserPrompt for TerminalPrompt {
    fn confirm(&self, prompt: &Prompt) -> bool {
        if self.assume_yes {
            return true;
        }
        print!("{} [y/N] ", prompt.message());
        let _ = io::stdout().flush();
        matches!(
            read_line(),
            Ok(Some(answer)) if matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
        )
    }

    fn alert(&self, message: &str) {
        eprintln!("{message}");
    }
}
