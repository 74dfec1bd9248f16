//! Progress reporting for TTY and non-TTY environments.
//!
//! TTY mode: an overall file bar plus one spinner line for the file being
//! loaded. Non-TTY mode: hidden bars, the log carries the progress.

use std::io::IsTerminal;
use std::sync::Arc;
use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

fn files_style() -> Option<ProgressStyle> {
    ProgressStyle::with_template("{prefix:<10.cyan.bold} {bar:30.green/dim} {pos}/{len} files {elapsed:>4}")
        .ok()
        .map(|s| s.progress_chars("--"))
}

fn file_style() -> Option<ProgressStyle> {
    ProgressStyle::with_template("{spinner:.green} {prefix:<24.dim} {pos:>7} rows {wide_msg:.dim}").ok()
}

/// Central progress context managing the bars of one run.
pub struct ProgressContext {
    multi: MultiProgress,
    is_tty: bool,
}

impl ProgressContext {
    /// Create new context, detecting TTY automatically.
    pub fn new() -> Self {
        Self::with_tty(std::io::stderr().is_terminal())
    }

    /// Context that never draws; used by tests and dry runs piped to files.
    pub fn hidden() -> Self {
        Self::with_tty(false)
    }

    fn with_tty(is_tty: bool) -> Self {
        Self {
            multi: MultiProgress::new(),
            is_tty,
        }
    }

    /// Overall bar counting processed files.
    pub fn files_bar(&self, total: usize) -> ProgressBar {
        if !self.is_tty {
            return ProgressBar::hidden();
        }
        let pb = self.multi.add(ProgressBar::new(total as u64));
        if let Some(style) = files_style() {
            pb.set_style(style);
        }
        pb.set_prefix("load");
        pb
    }

    /// Spinner line for one data file; `inc` it per row.
    pub fn file_line(&self, name: &str) -> ProgressBar {
        if !self.is_tty {
            return ProgressBar::hidden();
        }
        let pb = self.multi.add(ProgressBar::new_spinner());
        if let Some(style) = file_style() {
            pb.set_style(style);
        }
        let display = name.get(..24).unwrap_or(name);
        pb.set_prefix(display.to_string());
        pb.enable_steady_tick(Duration::from_millis(80));
        pb
    }

    /// Print a line above managed progress bars.
    ///
    /// Use this instead of `eprintln!` when progress bars are active.
    pub fn println(&self, msg: impl AsRef<str>) {
        if self.is_tty {
            let _ = self.multi.println(msg);
        } else {
            eprintln!("{}", msg.as_ref());
        }
    }

    pub fn is_tty(&self) -> bool {
        self.is_tty
    }

    /// Get reference to `MultiProgress` for the log bridge.
    pub fn multi(&self) -> &MultiProgress {
        &self.multi
    }
}

impl Default for ProgressContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Thread-safe wrapper for `ProgressContext`.
pub type SharedProgress = Arc<ProgressContext>;

/// Format number with thousand separators.
pub fn fmt_num(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fmt_num_small() {
        assert_eq!(fmt_num(0), "0");
        assert_eq!(fmt_num(500), "500");
    }

    #[test]
    fn fmt_num_thousands() {
        assert_eq!(fmt_num(1_000), "1,000");
        assert_eq!(fmt_num(123_456), "123,456");
        assert_eq!(fmt_num(3_456_789), "3,456,789");
    }

    #[test]
    fn hidden_context_draws_nothing() {
        let progress = ProgressContext::hidden();
        assert!(!progress.is_tty());
        assert!(progress.files_bar(3).is_hidden());
        assert!(progress.file_line("03-01-2020.csv").is_hidden());
    }
}
