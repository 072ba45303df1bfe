//! Human-in-the-loop decisions over automatic matches

use dialoguer::{Confirm, Input, Select};
use thiserror::Error;

use crate::{
    domain::work::{NEEDS_ATTENTION, ResolvedWork, VideoLink},
    interrupt::Interrupt,
};

#[derive(Debug, Error)]
pub enum ReviewError {
    #[error("prompt failed: {0}")]
    Prompt(#[from] dialoguer::Error),

    #[error("review interrupted")]
    Interrupted,
}

/// One answer covering the whole flagged queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchDecision {
    AcceptAll,
    MarkAllNeedsAttention,
}

/// What to do with one work under manual review
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewCommand {
    Keep,
    Replace(String),
    MarkNeedsAttention,
    Skip,
}

pub trait Reviewer {
    /// Aggregate accept/reject over every work whose match came from a foreign uploader
    fn decide_flagged(
        &mut self,
        flagged: &[&ResolvedWork],
        artist: &str,
    ) -> Result<BatchDecision, ReviewError>;

    /// Decision for a single work; `position` is 1-based
    fn review(
        &mut self,
        work: &ResolvedWork,
        position: usize,
        total: usize,
    ) -> Result<ReviewCommand, ReviewError>;
}

/// Interactive reviewer on the controlling terminal
pub struct TerminalReviewer {
    interrupt: Interrupt,
}

impl TerminalReviewer {
    pub fn new(interrupt: Interrupt) -> Self {
        Self { interrupt }
    }

    fn check(&self) -> Result<(), ReviewError> {
        if self.interrupt.is_set() {
            Err(ReviewError::Interrupted)
        } else {
            Ok(())
        }
    }
}

impl Reviewer for TerminalReviewer {
    fn decide_flagged(
        &mut self,
        flagged: &[&ResolvedWork],
        artist: &str,
    ) -> Result<BatchDecision, ReviewError> {
        println!();
        println!("{}", "=".repeat(70));
        println!(
            "Found {} tracks NOT uploaded by '{artist}':",
            flagged.len()
        );
        println!("{}", "=".repeat(70));
        for work in flagged {
            println!();
            println!("  • {} ({})", work.title(), work.album());
            if let Some(provenance) = &work.provenance {
                println!("    Uploader: {}", provenance.uploader);
            }
            println!("    URL: {}", work.url);
        }
        println!();

        let accept = Confirm::new()
            .with_prompt(format!("Include these non-{artist} URLs?"))
            .default(false)
            .interact()?;
        self.check()?;

        Ok(if accept {
            BatchDecision::AcceptAll
        } else {
            BatchDecision::MarkAllNeedsAttention
        })
    }

    fn review(
        &mut self,
        work: &ResolvedWork,
        position: usize,
        total: usize,
    ) -> Result<ReviewCommand, ReviewError> {
        println!();
        println!("{}", "=".repeat(70));
        println!("[{position}/{total}] {}", work.title());
        println!("{}", "=".repeat(70));
        println!("Album: {}", work.album());
        println!("Current URL: {}", work.url);
        if let Some(provenance) = &work.provenance {
            println!("Uploader: {}", provenance.uploader);
            println!("Match Score: {:.2}", provenance.score);
        }

        let choice = Select::new()
            .with_prompt("Keep this URL?")
            .items(&["keep", "replace", "mark as needing attention", "skip"])
            .default(0)
            .interact()?;
        self.check()?;

        let command = match choice {
            0 => ReviewCommand::Keep,
            1 => {
                let url: String = Input::new()
                    .with_prompt(format!("Replacement URL (or '{NEEDS_ATTENTION}')"))
                    .allow_empty(true)
                    .interact_text()?;
                self.check()?;
                match VideoLink::parse(&url) {
                    VideoLink::NotFound => {
                        println!("No URL provided, keeping original");
                        ReviewCommand::Keep
                    }
                    VideoLink::NeedsAttention => ReviewCommand::MarkNeedsAttention,
                    _ => ReviewCommand::Replace(url.trim().to_string()),
                }
            }
            2 => ReviewCommand::MarkNeedsAttention,
            _ => ReviewCommand::Skip,
        };
        Ok(command)
    }
}

/// Answers prompts from a fixed script
#[cfg(test)]
pub(crate) mod scripted {
    use std::collections::VecDeque;

    use super::*;

    #[derive(Default)]
    pub(crate) struct ScriptedReviewer {
        pub batch: Option<BatchDecision>,
        pub commands: VecDeque<ReviewCommand>,
        pub seen: Vec<String>,
        pub flagged_seen: Vec<String>,
    }

    impl ScriptedReviewer {
        pub fn with_commands(commands: impl IntoIterator<Item = ReviewCommand>) -> Self {
            Self {
                commands: commands.into_iter().collect(),
                ..Default::default()
            }
        }
    }

    impl Reviewer for ScriptedReviewer {
        fn decide_flagged(
            &mut self,
            flagged: &[&ResolvedWork],
            _artist: &str,
        ) -> Result<BatchDecision, ReviewError> {
            self.flagged_seen = flagged.iter().map(|w| w.title().to_string()).collect();
            self.batch.ok_or(ReviewError::Interrupted)
        }

        fn review(
            &mut self,
            work: &ResolvedWork,
            _position: usize,
            _total: usize,
        ) -> Result<ReviewCommand, ReviewError> {
            self.seen.push(work.title().to_string());
            self.commands.pop_front().ok_or(ReviewError::Interrupted)
        }
    }
}
