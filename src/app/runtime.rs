//! Run modes: plan preview, URL downloads and the JSON bridge.

use std::io::{self, IsTerminal, Read, Write};
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};
use webdownload_core::{
    AutoConfirm, BrowserCookies, CoordinatorBuilder, DispatchOutcome, DownloadCoordinator,
    DownloadRequest, NativeDownloader, UiHandle, resolve_plan, ui,
};

use crate::app::settings::RunSettings;
use crate::app::ui_loop::{self, UiOptions};
use crate::cli::Args;

/// Totals reported at the end of a run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RunSummary {
    pub saved: usize,
    pub failed: usize,
    pub cancelled: usize,
}

pub(crate) async fn run(args: &Args, settings: &RunSettings) -> Result<RunSummary> {
    if args.bridge {
        return run_bridge(args, settings).await;
    }

    let urls = collect_urls(args)?;
    if urls.is_empty() {
        info!("No input provided. Pass URLs as arguments or pipe them via stdin.");
        info!("Example: echo 'https://example.com/report.pdf' | webdownload");
        return Ok(RunSummary::default());
    }

    if args.dry_run {
        print_plans(args, settings, &urls)?;
        return Ok(RunSummary::default());
    }

    // Piped URLs leave no terminal to answer dialogs on.
    let interactive = !settings.auto_confirm && !args.urls.is_empty() && io::stdin().is_terminal();
    let session = Session::start(args, settings, interactive)?;
    let downloader = NativeDownloader::new(Arc::clone(&session.coordinator));

    let mut outcomes = Vec::with_capacity(urls.len());
    for url in &urls {
        let outcome = if args.image {
            downloader.download_image(url).await
        } else {
            let request = request_for(&session.coordinator, args, url).await;
            match session.coordinator.start(request).await {
                Ok(outcome) => Some(outcome),
                Err(e) => {
                    warn!(%url, error = %e, "download not started");
                    None
                }
            }
        };
        outcomes.push(outcome);
    }

    Ok(session.finish(outcomes).await)
}

/// Bridge messages arrive on stdin, so dialogs are never shown.
async fn run_bridge(args: &Args, settings: &RunSettings) -> Result<RunSummary> {
    let session = Session::start(args, settings, false)?;
    let downloader = NativeDownloader::new(Arc::clone(&session.coordinator));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut outcomes = Vec::new();
    while let Some(line) = lines.next_line().await.context("Failed to read bridge input")? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        debug!(message = line, "bridge message");
        outcomes.push(downloader.handle_message(line).await);
    }

    Ok(session.finish(outcomes).await)
}

struct Session {
    coordinator: Arc<DownloadCoordinator>,
    stop_ui: oneshot::Sender<()>,
    ui_task: tokio::task::JoinHandle<()>,
}

impl Session {
    fn start(args: &Args, settings: &RunSettings, interactive: bool) -> Result<Self> {
        let (handle, receiver) = ui::channel();
        let (stop_ui, stop_rx) = oneshot::channel();
        let options = UiOptions {
            interactive,
            quiet: args.quiet,
        };
        let ui_task = tokio::spawn(ui_loop::run(receiver, stop_rx, options));
        let coordinator = build_coordinator(settings, interactive, handle)?;
        Ok(Self {
            coordinator: Arc::new(coordinator),
            stop_ui,
            ui_task,
        })
    }

    async fn finish(self, outcomes: Vec<Option<DispatchOutcome>>) -> RunSummary {
        let mut summary = RunSummary::default();
        for outcome in outcomes {
            match outcome {
                Some(DispatchOutcome::Cancelled) => summary.cancelled += 1,
                Some(outcome) => {
                    if outcome.finished().await.is_some() {
                        summary.saved += 1;
                    } else {
                        summary.failed += 1;
                    }
                }
                None => summary.failed += 1,
            }
        }

        let _ = self.stop_ui.send(());
        if let Err(e) = self.ui_task.await {
            warn!(error = %e, "UI loop ended abnormally");
        }
        info!(
            saved = summary.saved,
            failed = summary.failed,
            cancelled = summary.cancelled,
            "Downloads finished"
        );
        summary
    }
}

fn build_coordinator(
    settings: &RunSettings,
    interactive: bool,
    ui: UiHandle,
) -> Result<DownloadCoordinator> {
    let mut builder = CoordinatorBuilder::new(settings.coordinator_settings());
    if let Some(path) = &settings.cookies_file {
        let cookies = BrowserCookies::load(path)
            .with_context(|| format!("Failed to load cookies from '{}'", path.display()))?;
        builder = builder.cookies(cookies);
    }
    if !interactive {
        if !settings.auto_confirm {
            info!("No terminal to confirm on; downloads are confirmed automatically");
        }
        builder = builder.prompt(Arc::new(AutoConfirm));
    }
    Ok(builder.build(ui))
}

fn collect_urls(args: &Args) -> Result<Vec<String>> {
    let raw = if !args.urls.is_empty() {
        args.urls.join("\n")
    } else if !io::stdin().is_terminal() {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read URLs from stdin")?;
        buffer
    } else {
        String::new()
    };
    Ok(raw
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(ToString::to_string)
        .collect())
}

/// A request carrying the header values given on the command line.
fn explicit_request(args: &Args, user_agent: &str, url: &str) -> DownloadRequest {
    let mut request = DownloadRequest::new(url, user_agent);
    if let Some(disposition) = &args.content_disposition {
        request = request.with_content_disposition(Some(disposition.clone()));
    }
    if let Some(mime) = &args.mime_type {
        request = request.with_mime_type(Some(mime.clone()));
    }
    if let Some(length) = args.content_length {
        request = request.with_content_length(Some(length));
    }
    if let Some(name) = &args.file_name {
        request = request.with_suggested_file_name(Some(name.clone()));
    }
    request
}

/// Probes the URL unless header values were supplied or probing is off.
async fn request_for(coordinator: &DownloadCoordinator, args: &Args, url: &str) -> DownloadRequest {
    let explicit = args.no_probe
        || args.content_disposition.is_some()
        || args.mime_type.is_some()
        || args.content_length.is_some();
    if explicit {
        return explicit_request(args, coordinator.user_agent(), url);
    }
    let request = coordinator.probe_request(url).await;
    match &args.file_name {
        Some(name) => request.with_suggested_file_name(Some(name.clone())),
        None => request,
    }
}

/// One JSON object per line; never touches the network.
fn print_plans(args: &Args, settings: &RunSettings, urls: &[String]) -> Result<()> {
    let rules = settings.plan_rules();
    let mut stdout = io::stdout().lock();
    for url in urls {
        let request = explicit_request(args, &settings.user_agent, url);
        let plan = resolve_plan(&request, &rules);
        let line = serde_json::json!({ "url": url, "plan": plan });
        serde_json::to_writer(&mut stdout, &line).context("Failed to write plan")?;
        writeln!(stdout).context("Failed to write plan")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_explicit_request_uses_flags() {
        let args = Args::try_parse_from([
            "webdownload",
            "--mime-type",
            "image/png",
            "--file-name",
            "cat",
            "--content-length",
            "10",
        ])
        .unwrap();
        let request = explicit_request(&args, "ua", "https://example.com/x");
        assert_eq!(request.mime_type(), Some("image/png"));
        assert_eq!(request.suggested_file_name(), Some("cat"));
        assert_eq!(request.content_length(), Some(10));
        assert_eq!(request.content_disposition(), None);
        assert_eq!(request.user_agent(), "ua");
    }

    #[test]
    fn test_collect_urls_skips_blank_and_comment_lines() {
        let args = Args::try_parse_from([
            "webdownload",
            "https://a.example/1",
            "  ",
            "# note",
        ])
        .unwrap();
        assert_eq!(collect_urls(&args).unwrap(), vec!["https://a.example/1".to_string()]);
    }
}
