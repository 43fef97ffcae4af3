//! stderr progress for the binary: a spinner per startup stage and a bar
//! over the image list, or plain `==>` lines when not on a terminal.

use clap::ValueEnum;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::io::IsTerminal;
use std::time::{Duration, Instant};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum UiMode {
    /// Spinners when stderr is a terminal and stdout is not piped
    #[default]
    Auto,
    Plain,
    Pretty,
}

#[derive(Clone, Debug)]
pub struct Ui {
    pretty: bool,
}

impl Ui {
    pub fn new(mode: UiMode) -> Self {
        let pretty = std::io::stderr().is_terminal()
            && match mode {
                UiMode::Pretty => true,
                UiMode::Auto => std::io::stdout().is_terminal(),
                UiMode::Plain => false,
            };
        Self { pretty }
    }

    pub fn stage(&self, name: &'static str) -> Stage {
        let spinner = if self.pretty {
            let spinner = ProgressBar::with_draw_target(None, ProgressDrawTarget::stderr());
            spinner.set_style(
                ProgressStyle::with_template("{spinner} {msg} {elapsed}")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            );
            spinner.set_message(name);
            spinner.enable_steady_tick(Duration::from_millis(120));
            Some(spinner)
        } else {
            eprintln!("==> {}", name);
            None
        };
        Stage {
            name,
            started: Instant::now(),
            spinner,
        }
    }

    /// Bar over the image list; hidden in plain mode.
    pub fn images(&self, total: usize) -> ProgressBar {
        if !self.pretty {
            return ProgressBar::hidden();
        }
        let bar = ProgressBar::with_draw_target(Some(total as u64), ProgressDrawTarget::stderr());
        bar.set_style(
            ProgressStyle::with_template("{bar:30} {pos}/{len} images {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        bar
    }
}

/// Reports the stage's elapsed time when dropped.
pub struct Stage {
    name: &'static str,
    started: Instant,
    spinner: Option<ProgressBar>,
}

impl Drop for Stage {
    fn drop(&mut self) {
        let done = format!("{} done in {:.2?}", self.name, self.started.elapsed());
        match &self.spinner {
            Some(spinner) => spinner.finish_with_message(done),
            None => eprintln!("    {}", done),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_mode_never_draws_bars() {
        let ui = Ui::new(UiMode::Plain);
        assert!(!ui.pretty);
        assert!(ui.images(3).is_hidden());
        drop(ui.stage("Resolve settings"));
    }

    #[test]
    fn ui_flag_values() {
        assert_eq!(UiMode::from_str("pretty", true), Ok(UiMode::Pretty));
        assert_eq!(UiMode::from_str("plain", true), Ok(UiMode::Plain));
        assert!(UiMode::from_str("fancy", true).is_err());
    }
}
