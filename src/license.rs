use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// Generations allowed before a license key is required.
pub const FREE_GENERATIONS: u32 = 30;

/// SHA-256 digests of issued license keys. Keys themselves never ship in
/// the binary.
const ISSUED_KEY_DIGESTS: &[&str] = &[
    "7f3b9a2c5d8e1f406b7a9c2d5e8f1a4b7c0d3e6f9a2b5c8d1e4f7a0b3c6d9e2f",
    "2a8c4e6f0b1d3a5c7e9f2b4d6a8c0e1f3a5b7d9e2c4f6a8b0d1e3f5a7c9b2d4e",
    "e1d4f7a0c3b6e9d2f5a8c1b4e7d0f3a6c9b2e5d8f1a4c7b0e3d6f9a2c5b8e1d4",
];

#[derive(Debug, Default, Serialize, Deserialize)]
struct TrialState {
    #[serde(default)]
    uses: u32,
}

/// True when the trimmed key hashes to one of the issued digests.
pub fn key_is_valid(key: &str) -> bool {
    let digest = hex_digest(key.trim());
    ISSUED_KEY_DIGESTS.contains(&digest.as_str())
}

fn hex_digest(key: &str) -> String {
    let digest = Sha256::digest(key.as_bytes());
    let mut out = String::with_capacity(digest.len() * 2);
    for b in digest {
        out.push_str(&format!("{b:02x}"));
    }
    out
}

/// Gate one generation: a valid license key passes unconditionally,
/// otherwise a persisted trial counter is spent.
pub fn authorize(state_dir: &Path, license_key: Option<&str>) -> anyhow::Result<()> {
    if let Some(key) = license_key {
        if key_is_valid(key) {
            return Ok(());
        }
        tracing::warn!("configured license key is not valid; counting against the free trial");
    }

    let path = trial_state_path(state_dir);
    let mut state = load_state(&path)?;
    if state.uses >= FREE_GENERATIONS {
        bail!(
            "free trial exhausted ({FREE_GENERATIONS} generations); \
set license_key in config.toml or COMMITGEN_LICENSE_KEY"
        );
    }
    state.uses += 1;
    save_state_atomic(&path, &state)?;
    Ok(())
}

/// Remaining free generations, or None when a valid license key removes
/// the limit.
pub fn remaining(state_dir: &Path, license_key: Option<&str>) -> anyhow::Result<Option<u32>> {
    if license_key.is_some_and(key_is_valid) {
        return Ok(None);
    }
    let state = load_state(&trial_state_path(state_dir))?;
    Ok(Some(FREE_GENERATIONS.saturating_sub(state.uses)))
}

fn trial_state_path(state_dir: &Path) -> PathBuf {
    state_dir.join("trial.json")
}

fn load_state(path: &Path) -> anyhow::Result<TrialState> {
    let bytes = match std::fs::read(path) {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(TrialState::default()),
        Err(e) => {
            return Err(anyhow::Error::new(e))
                .with_context(|| format!("failed to read trial state: {}", path.display()))
        }
    };
    serde_json::from_slice(&bytes).context("failed to parse trial state JSON")
}

fn save_state_atomic(path: &Path, state: &TrialState) -> anyhow::Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create state directory: {}", dir.display()))?;

    let mut tmp = path.to_path_buf();
    tmp.set_file_name("trial.json.tmp");
    let bytes = serde_json::to_vec_pretty(state).context("failed to serialize trial state")?;
    std::fs::write(&tmp, bytes)
        .with_context(|| format!("failed to write temp trial state: {}", tmp.display()))?;
    std::fs::rename(&tmp, path)
        .with_context(|| format!("failed to move trial state into place: {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn digest_matches_known_vector() {
        // FIPS 180-2 test vector for "abc".
        assert_eq!(
            hex_digest("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn unissued_key_is_rejected() {
        assert!(!key_is_valid("not-a-real-key"));
        assert!(!key_is_valid(""));
    }

    #[test]
    fn trial_counts_down_and_exhausts() {
        let dir = TempDir::new().unwrap();
        for used in 0..FREE_GENERATIONS {
            assert_eq!(
                remaining(dir.path(), None).unwrap(),
                Some(FREE_GENERATIONS - used)
            );
            authorize(dir.path(), None).unwrap();
        }
        assert_eq!(remaining(dir.path(), None).unwrap(), Some(0));
        assert!(authorize(dir.path(), None).is_err());
    }

    #[test]
    fn invalid_key_still_spends_the_trial() {
        let dir = TempDir::new().unwrap();
        authorize(dir.path(), Some("bogus")).unwrap();
        assert_eq!(
            remaining(dir.path(), Some("bogus")).unwrap(),
            Some(FREE_GENERATIONS - 1)
        );
    }

    #[test]
    fn corrupt_state_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("trial.json"), b"{nope").unwrap();
        assert!(authorize(dir.path(), None).is_err());
    }
}
