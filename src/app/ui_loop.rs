//! Console rendering of pipeline UI events.
//!
//! Toasts and notifications print above the progress bars, streaming
//! downloads get an `indicatif` bar each, and dialogs (confirm, open) are
//! answered on stdin when the session is interactive.

use std::collections::HashMap;
use std::io::{self, Write};

use indicatif::{HumanBytes, MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use tokio::sync::oneshot;
use tracing::{debug, warn};
use webdownload_core::{
    CompletedDownload, ConfirmationRequest, UiEvent, UiReceiver,
    opener::{FileOpener, SystemOpener},
};

#[derive(Debug, Clone, Copy)]
pub(crate) struct UiOptions {
    /// Dialogs are answered on stdin; otherwise confirmations default to yes
    /// and files are never opened.
    pub interactive: bool,
    pub quiet: bool,
}

/// Runs until every handle is dropped or `stop` fires; events already
/// queued when `stop` fires are still handled.
pub(crate) async fn run(mut events: UiReceiver, mut stop: oneshot::Receiver<()>, options: UiOptions) {
    let mut view = ConsoleView::new(options);
    loop {
        tokio::select! {
            biased;
            event = events.recv() => match event {
                Some(event) => view.handle(event).await,
                None => break,
            },
            _ = &mut stop => {
                while let Some(event) = events.try_recv() {
                    view.handle(event).await;
                }
                break;
            }
        }
    }
    view.finish();
}

struct ConsoleView {
    options: UiOptions,
    bars: MultiProgress,
    active: HashMap<String, ProgressBar>,
    opener: SystemOpener,
}

impl ConsoleView {
    fn new(options: UiOptions) -> Self {
        let bars = if options.quiet {
            MultiProgress::with_draw_target(ProgressDrawTarget::hidden())
        } else {
            MultiProgress::new()
        };
        Self {
            options,
            bars,
            active: HashMap::new(),
            opener: SystemOpener,
        }
    }

    async fn handle(&mut self, event: UiEvent) {
        match event {
            UiEvent::Toast(message) => self.say(&message),
            UiEvent::Progress {
                file_name,
                bytes,
                total,
            } => self.progress(file_name, bytes, total),
            UiEvent::Notification(done) => {
                self.finish_bar(&done.file_name);
                self.say(&format!("Download complete: {} -> {}", done.file_name, done.path.display()));
            }
            UiEvent::OpenPrompt(done) => {
                self.finish_bar(&done.file_name);
                self.say(&format!("Saved {} -> {}", done.file_name, done.path.display()));
                self.offer_open(&done).await;
            }
            UiEvent::ConfirmDownload { request, reply } => {
                let answer = self.confirm(&request).await;
                if reply.send(answer).is_err() {
                    debug!(file_name = %request.file_name, "confirmation no longer awaited");
                }
            }
        }
    }

    fn say(&self, message: &str) {
        if self.options.quiet {
            return;
        }
        if self.bars.println(message).is_err() {
            eprintln!("{message}");
        }
    }

    fn progress(&mut self, file_name: String, bytes: u64, total: Option<u64>) {
        let bar = self.active.entry(file_name.clone()).or_insert_with(|| {
            let bar = match total {
                Some(total) => ProgressBar::new(total).with_style(
                    ProgressStyle::with_template("{msg} [{bar:30}] {bytes}/{total_bytes}")
                        .unwrap_or_else(|_| ProgressStyle::default_bar()),
                ),
                None => ProgressBar::new_spinner().with_style(
                    ProgressStyle::with_template("{spinner} {msg} {bytes}")
                        .unwrap_or_else(|_| ProgressStyle::default_spinner()),
                ),
            };
            let bar = self.bars.add(bar);
            bar.set_message(file_name);
            bar
        });
        bar.set_position(bytes);
    }

    fn finish_bar(&mut self, file_name: &str) {
        if let Some(bar) = self.active.remove(file_name) {
            bar.finish_and_clear();
        }
    }

    async fn confirm(&self, request: &ConfirmationRequest) -> bool {
        if !self.options.interactive {
            return true;
        }
        let size = request
            .content_length
            .map_or_else(|| "unknown size".to_string(), |len| HumanBytes(len).to_string());
        if request.is_image {
            self.say(&format!("Image preview: {}", request.url));
        }
        ask(format!(
            "Download {} ({}, {size})? [Y/n]",
            request.file_name, request.mime_type
        ))
        .await
        .unwrap_or(true)
    }

    async fn offer_open(&self, done: &CompletedDownload) {
        if !self.options.interactive {
            return;
        }
        if ask(format!("Open {}? [y/N]", done.file_name)).await != Some(true) {
            return;
        }
        if let Err(e) = self.opener.open(&done.path, &done.mime_type) {
            warn!(error = %e, "could not open file");
            self.say(&format!("Cannot open {}", done.file_name));
        }
    }

    fn finish(self) {
        for bar in self.active.into_values() {
            bar.finish_and_clear();
        }
    }
}

/// Asks a yes/no question on stderr. `None` for an empty answer or when
/// stdin is unavailable; the caller picks the default.
async fn ask(question: String) -> Option<bool> {
    let line = tokio::task::spawn_blocking(move || {
        eprint!("{question} ");
        let _ = io::stderr().flush();
        let mut line = String::new();
        io::stdin().read_line(&mut line).map(|_| line)
    })
    .await
    .ok()?
    .ok()?;
    parse_answer(&line)
}

fn parse_answer(line: &str) -> Option<bool> {
    match line.trim().to_ascii_lowercase().as_str() {
        "" => None,
        "y" | "yes" => Some(true),
        _ => Some(false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use webdownload_core::ui;

    #[test]
    fn test_parse_answer() {
        assert_eq!(parse_answer("y\n"), Some(true));
        assert_eq!(parse_answer(" YES "), Some(true));
        assert_eq!(parse_answer("n"), Some(false));
        assert_eq!(parse_answer("whatever"), Some(false));
        assert_eq!(parse_answer("\n"), None);
    }

    #[tokio::test]
    async fn test_non_interactive_loop_confirms_and_drains_on_stop() {
        let (handle, receiver) = ui::channel();
        let (stop_tx, stop_rx) = oneshot::channel();
        let options = UiOptions {
            interactive: false,
            quiet: true,
        };
        let task = tokio::spawn(run(receiver, stop_rx, options));

        let (reply, answer) = oneshot::channel();
        handle.post(UiEvent::ConfirmDownload {
            request: ConfirmationRequest {
                url: "https://example.com/a.pdf".into(),
                file_name: "a.pdf".into(),
                mime_type: "application/pdf".into(),
                is_image: false,
                content_length: None,
            },
            reply,
        });
        assert!(answer.await.unwrap());

        handle.toast("queued before stop");
        stop_tx.send(()).unwrap();
        task.await.unwrap();
    }
}
