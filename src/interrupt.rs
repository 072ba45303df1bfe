use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

/// Shared "stop requested" flag, set by Ctrl+C
#[derive(Debug, Clone, Default)]
pub struct Interrupt {
    flag: Arc<AtomicBool>,
}

impl Interrupt {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs the process-wide Ctrl+C handler.
    ///
    /// The first press only sets the flag so the current stage can save its
    /// progress, a second one exits right away.
    pub fn install() -> anyhow::Result<Self> {
        let interrupt = Self::new();
        let flag = interrupt.flag.clone();
        ctrlc::set_handler(move || {
            if flag.swap(true, Ordering::SeqCst) {
                eprintln!("\nInterrupted again, exiting without saving");
                std::process::exit(130);
            }
            eprintln!("\nInterrupt received, saving progress...");
        })?;
        Ok(interrupt)
    }

    pub fn is_set(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    #[cfg(test)]
    pub fn trigger(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }
}
