use anyhow::{anyhow, Context};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Modified,
    Deleted,
    Renamed { from: String },
}

impl ChangeKind {
    pub fn label(&self) -> &'static str {
        match self {
            ChangeKind::Added => "added",
            ChangeKind::Modified => "modified",
            ChangeKind::Deleted => "deleted",
            ChangeKind::Renamed { .. } => "renamed",
        }
    }
}

/// One staged file as reported by the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedChange {
    pub kind: ChangeKind,
    pub path: String,
}

pub async fn staged_changes(repo: &Path) -> anyhow::Result<Vec<StagedChange>> {
    let out = git(repo, &["diff", "--cached", "--name-status", "-z"]).await?;
    parse_name_status(&out)
}

pub async fn staged_diff(repo: &Path, path: &str) -> anyhow::Result<String> {
    let out = git(repo, &["diff", "--cached", "--", path]).await?;
    Ok(String::from_utf8_lossy(&out).into_owned())
}

async fn git(repo: &Path, args: &[&str]) -> anyhow::Result<Vec<u8>> {
    let output = tokio::process::Command::new("git")
        .arg("-C")
        .arg(repo)
        .args(args)
        .output()
        .await
        .context("failed to run git (is it installed?)")?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(anyhow!(
            "git {} failed: {}",
            args.first().copied().unwrap_or_default(),
            stderr.trim()
        ));
    }

    Ok(output.stdout)
}

/// Parse `--name-status -z` output. Records are `STATUS NUL path NUL`;
/// rename and copy records carry the source path first:
/// `R<score> NUL old NUL new NUL`.
fn parse_name_status(bytes: &[u8]) -> anyhow::Result<Vec<StagedChange>> {
    let mut fields = bytes.split(|&b| b == 0).filter(|f| !f.is_empty());
    let mut changes = Vec::new();

    while let Some(status) = fields.next() {
        let status =
            std::str::from_utf8(status).context("git emitted a non-UTF-8 status field")?;
        let first = fields
            .next()
            .ok_or_else(|| anyhow!("truncated name-status record for status {status}"))?;
        let first = String::from_utf8_lossy(first).into_owned();

        let change = match status.as_bytes().first() {
            Some(b'A') => StagedChange {
                kind: ChangeKind::Added,
                path: first,
            },
            Some(b'D') => StagedChange {
                kind: ChangeKind::Deleted,
                path: first,
            },
            Some(b'R') | Some(b'C') => {
                let target = fields
                    .next()
                    .ok_or_else(|| anyhow!("name-status record {status} is missing its target path"))?;
                let target = String::from_utf8_lossy(target).into_owned();
                let kind = if status.starts_with('R') {
                    ChangeKind::Renamed { from: first }
                } else {
                    // A copy shows up as a brand-new file.
                    ChangeKind::Added
                };
                StagedChange { kind, path: target }
            }
            // M, T (type change), and anything exotic read as a modification.
            _ => StagedChange {
                kind: ChangeKind::Modified,
                path: first,
            },
        };
        changes.push(change);
    }

    Ok(changes)
}
