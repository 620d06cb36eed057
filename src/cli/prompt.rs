//! Interactive confirmation on the terminal
//!
//! The summary and the question go to stderr so stdout stays a single
//! JSON object. A first SIGINT while waiting cancels the prompt; a second
//! one terminates the process. Outside the prompt SIGINT keeps its default
//! action.

use std::io::{self, BufRead, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use signal_hook::consts::SIGINT;
use signal_hook::flag;

use crate::orchestrator::{Confirmer, Decision};

const POLL: Duration = Duration::from_millis(200);

/// Flags the SIGINT handlers consult
#[derive(Debug)]
struct PromptSignals {
    /// Cleared while a prompt is waiting for an answer
    idle: Arc<AtomicBool>,
    /// Set by SIGINT; only read while prompting
    interrupted: Arc<AtomicBool>,
}

impl PromptSignals {
    fn new() -> Self {
        Self {
            idle: Arc::new(AtomicBool::new(true)),
            interrupted: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Open a prompt window with a cleared interrupt flag
    fn begin(&self) -> PromptWindow<'_> {
        self.interrupted.store(false, Ordering::SeqCst);
        self.idle.store(false, Ordering::SeqCst);
        PromptWindow { signals: self }
    }
}

/// Closes the prompt window on drop
struct PromptWindow<'a> {
    signals: &'a PromptSignals,
}

impl PromptWindow<'_> {
    fn interrupted(&self) -> bool {
        self.signals.interrupted.load(Ordering::SeqCst)
    }
}

impl Drop for PromptWindow<'_> {
    fn drop(&mut self) {
        self.signals.idle.store(true, Ordering::SeqCst);
    }
}

pub struct StdinConfirmer {
    signals: PromptSignals,
}

impl StdinConfirmer {
    /// Install the SIGINT handlers. They run in registration order: outside
    /// a prompt the default action runs; inside one a repeat interrupt
    /// exits with 130 and a first one only sets the flag.
    pub fn install() -> io::Result<Self> {
        let signals = PromptSignals::new();
        flag::register_conditional_default(SIGINT, Arc::clone(&signals.idle))?;
        flag::register_conditional_shutdown(SIGINT, 130, Arc::clone(&signals.interrupted))?;
        flag::register(SIGINT, Arc::clone(&signals.interrupted))?;
        Ok(Self { signals })
    }
}

/// `y`/`yes` accept, `n`/`no` decline, anything else asks again
pub fn parse_answer(line: &str) -> Option<Decision> {
    match line.trim().to_lowercase().as_str() {
        "y" | "yes" => Some(Decision::Accept),
        "n" | "no" => Some(Decision::Decline),
        _ => None,
    }
}

impl Confirmer for StdinConfirmer {
    fn confirm(&self, summary: &str) -> Decision {
        let window = self.signals.begin();
        let mut stderr = io::stderr();
        let _ = write!(stderr, "{} [y/n] ", summary);
        let _ = stderr.flush();

        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let stdin = io::stdin();
            for line in stdin.lock().lines() {
                if tx.send(line).is_err() {
                    break;
                }
            }
        });

        loop {
            if window.interrupted() {
                let _ = writeln!(stderr);
                return Decision::Cancel;
            }
            match rx.recv_timeout(POLL) {
                Ok(Ok(line)) => match parse_answer(&line) {
                    Some(decision) => return decision,
                    None => {
                        let _ = write!(stderr, "Please answer y/yes or n/no: ");
                        let _ = stderr.flush();
                    }
                },
                // stdin closed or unreadable: nobody can answer
                Ok(Err(_)) | Err(mpsc::RecvTimeoutError::Disconnected) => return Decision::Cancel,
                Err(mpsc::RecvTimeoutError::Timeout) => {}
            }
        }
    }
}
