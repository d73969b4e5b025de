use crate::provider::openai::CompletionClient;
use crate::provider::CompletionRequest;
use crate::singleflight::{Begin, SingleFlight};
use crate::{cli, config, git, license, paths, prompt};
use anyhow::{bail, Context};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

pub async fn cmd_generate(
    http: &reqwest::Client,
    cfg: Option<&config::Config>,
    args: &cli::Args,
) -> anyhow::Result<()> {
    let settings = config::Settings::resolve(cfg, args.model.as_deref(), args.max_tokens)?;

    let state_dir = paths::state_dir()?;
    license::authorize(&state_dir, settings.license_key.as_deref())?;

    let repo = args.repo.clone().unwrap_or_else(|| PathBuf::from("."));
    let changes = git::staged_changes(&repo).await?;
    if changes.is_empty() {
        bail!("nothing is staged; stage files with `git add` first");
    }

    let mut entries = Vec::with_capacity(changes.len());
    for change in changes {
        let diff = match change.kind {
            git::ChangeKind::Deleted => None,
            _ => Some(git::staged_diff(&repo, &change.path).await?),
        };
        entries.push((change, diff));
    }

    let messages = prompt::build(&settings.instruction, &entries, settings.max_request_chars)?;
    let request = CompletionRequest::new(settings.model.clone(), messages, settings.max_tokens);

    let flights = Arc::new(SingleFlight::new());
    let guard = match flights.begin() {
        Begin::Started(g) => g,
        Begin::Busy => bail!("a generation is already in progress"),
    };
    let cancel = guard.cancel_token();

    // Ctrl-C while streaming abandons the generation.
    let watcher = tokio::spawn({
        let flights = flights.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                flights.cancel_active();
            }
        }
    });

    let client = CompletionClient::new(http.clone());
    let mut view = MessageView::new(args.output.clone());
    let outcome = client
        .stream(&request, &settings.api_key, cancel, |text| view.update(text))
        .await;
    watcher.abort();
    drop(guard);

    match outcome {
        Ok(Some(text)) => view.finish(&text),
        Ok(None) => {
            eprintln!("cancelled; no commit message was produced");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

pub fn cmd_trial(cfg: Option<&config::Config>) -> anyhow::Result<()> {
    let state_dir = paths::state_dir()?;
    let key = config::license_key(cfg);
    match license::remaining(&state_dir, key.as_deref())? {
        None => println!("licensed: no generation limit"),
        Some(n) => println!(
            "trial: {n} of {} free generations remaining",
            license::FREE_GENERATIONS
        ),
    }
    Ok(())
}

/// Where the growing message goes. With `--output` the whole file is
/// overwritten on every delta, mirroring how an editor input field is
/// refreshed; otherwise only the new suffix of the cumulative text is
/// printed.
struct MessageView {
    output: Option<PathBuf>,
    printed: usize,
    write_failed: bool,
}

impl MessageView {
    fn new(output: Option<PathBuf>) -> Self {
        Self {
            output,
            printed: 0,
            write_failed: false,
        }
    }

    fn update(&mut self, text: &str) {
        match &self.output {
            Some(path) => {
                if let Err(e) = std::fs::write(path, text) {
                    if !self.write_failed {
                        tracing::warn!(path = %path.display(), error = %e, "failed to write output file");
                        self.write_failed = true;
                    }
                }
            }
            None => {
                // `text` is cumulative and append-only, so the old length is
                // always a valid boundary.
                print!("{}", &text[self.printed..]);
                std::io::stdout().flush().ok();
                self.printed = text.len();
            }
        }
    }

    fn finish(&mut self, text: &str) -> anyhow::Result<()> {
        match &self.output {
            Some(path) => {
                std::fs::write(path, text)
                    .with_context(|| format!("failed to write output file: {}", path.display()))?;
                eprintln!("wrote commit message to {}", path.display());
            }
            None => {
                if text.len() > self.printed {
                    print!("{}", &text[self.printed..]);
                }
                println!();
            }
        }
        Ok(())
    }
}
