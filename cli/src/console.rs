//! Operator console: line prompts, styled notices and the node listing.
//!
//! Generic over its input and output so menu flows can be driven from a
//! byte buffer in tests. Styling goes through crossterm commands queued onto
//! the writer.

use std::io::{self, BufRead, Write};

use crossterm::queue;
use crossterm::style::{Attribute, Color, Print, ResetColor, SetAttribute, SetForegroundColor};

use lamfront_core::cluster::NodeRegistry;
use lamfront_core::execution::Confirm;


pub struct Console<R, W> {
    input: R,
    output: W,
}

impl Console<io::StdinLock<'static>, io::Stdout> {
    pub fn stdio() -> Self {
        Console::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> Console<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Console { input, output }
    }

    pub fn into_output(self) -> W {
        self.output
    }

    /// Print `label` and read one trimmed line. `None` at end of input.
    pub fn prompt(&mut self, label: &str) -> Option<String> {
        let _ = write!(self.output, "{}", label);
        let _ = self.output.flush();
        let mut line = String::new();
        match self.input.read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(line.trim().to_string()),
        }
    }

    pub fn line(&mut self, text: &str) {
        let _ = writeln!(self.output, "{}", text);
    }

    pub fn title(&mut self, text: &str) {
        self.styled(Color::Cyan, true, text);
    }

    pub fn note(&mut self, text: &str) {
        self.styled(Color::Green, false, text);
    }

    pub fn warn(&mut self, text: &str) {
        self.styled(Color::Yellow, false, text);
    }

    pub fn fail(&mut self, text: &str) {
        self.styled(Color::Red, true, text);
    }

    pub fn bell(&mut self) {
        let _ = write!(self.output, "\x07");
        let _ = self.output.flush();
    }

    fn styled(&mut self, color: Color, bold: bool, text: &str) {
        let _ = queue!(self.output, SetForegroundColor(color));
        if bold {
            let _ = queue!(self.output, SetAttribute(Attribute::Bold));
        }
        let _ = queue!(
            self.output,
            Print(text),
            SetAttribute(Attribute::Reset),
            ResetColor,
            Print("\n")
        );
        let _ = self.output.flush();
    }

    /// Print the node table, master row highlighted.
    pub fn nodes(&mut self, registry: &NodeRegistry, master: Option<&str>) {
        self.title(&format!("{:<6} {:<24} {:<9} {}", "Slot", "Address", "Selected", "Reachable"));
        for (row, is_master) in node_rows(registry, master) {
            if is_master {
                self.styled(Color::Magenta, true, &row);
            } else {
                self.line(&row);
            }
        }
        match master {
            Some(m) => self.line(&format!("Master: {}", m)),
            None => self.warn("Master: undefined"),
        }
    }
}


/// Answers are Spanish/English style: `S` or `Y` continue, anything else
/// aborts.
impl<R: BufRead, W: Write> Confirm for Console<R, W> {
    fn confirm(&mut self, prompt: &str) -> bool {
        self.warn(prompt);
        self.prompt("(S/N) > ").map_or(false, |a| is_yes(&a))
    }
}

pub fn is_yes(answer: &str) -> bool {
    matches!(answer.trim(), "S" | "s" | "Y" | "y")
}


fn mark(flag: bool) -> &'static str {
    if flag {
        "[O]"
    } else {
        "[X]"
    }
}

/// One formatted row per node, paired with whether it is the master.
pub fn node_rows(registry: &NodeRegistry, master: Option<&str>) -> Vec<(String, bool)> {
    registry
        .nodes()
        .iter()
        .map(|n| {
            let is_master = master == Some(n.address.as_str());
            let row = format!(
                "{:<6} {:<24} {:<9} {}{}",
                n.slot_id,
                n.address,
                mark(n.selected),
                mark(n.reachable),
                if is_master { "  (master)" } else { "" }
            );
            (row, is_master)
        })
        .collect()
}
