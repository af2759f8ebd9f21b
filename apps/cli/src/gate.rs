//! Console operator gate: blocking stdin prompts for the manual steps the
//! browser passes cannot automate.

use std::io::{BufRead, Write};

use stargazer_shared::{GateCommand, OperatorGate};

/// Gate backed by the terminal. Prompts on stdout, reads commands from
/// stdin. Used whenever the run is interactive.
pub struct ConsoleGate;

impl OperatorGate for ConsoleGate {
    fn await_manual_step(&self, instructions: &str) -> GateCommand {
        println!();
        println!("{instructions}");
        println!("Type 'done' when finished, or 'abort' to stop:");

        let stdin = std::io::stdin();
        loop {
            print!("> ");
            let _ = std::io::stdout().flush();

            let mut line = String::new();
            if stdin.lock().read_line(&mut line).is_err() {
                return GateCommand::Abort;
            }
            match line.trim().to_lowercase().as_str() {
                "done" => return GateCommand::Done,
                "abort" => return GateCommand::Abort,
                "" => continue,
                other => println!("Unrecognized input '{other}'. Type 'done' or 'abort'."),
            }
        }
    }

    fn confirm_continue(&self, warning: &str) -> bool {
        println!();
        println!("{warning}");
        print!("Type 'yes' to continue, anything else to stop: ");
        let _ = std::io::stdout().flush();

        let mut line = String::new();
        if std::io::stdin().lock().read_line(&mut line).is_err() {
            return false;
        }
        line.trim().eq_ignore_ascii_case("yes")
    }
}
