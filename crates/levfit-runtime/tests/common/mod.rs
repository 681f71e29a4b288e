//! Shared helpers for integration tests

use std::env;
use std::fs;
use std::path::PathBuf;

/// Locate the `levfit-models` cdylib artifact next to the test binary.
///
/// Workspace test runs place it in the profile directory; dependency-only
/// builds may leave only the hash-suffixed copy under `deps/`. Tests that
/// need the artifact skip gracefully when neither exists.
pub fn models_cdylib() -> Option<PathBuf> {
    let exe = env::current_exe().ok()?;
    let deps = exe.parent()?;
    let profile = deps.parent()?;

    let plain = format!(
        "{}levfit_models{}",
        env::consts::DLL_PREFIX,
        env::consts::DLL_SUFFIX
    );
    let direct = profile.join(&plain);
    if direct.exists() {
        return Some(direct);
    }

    let prefix = format!("{}levfit_models", env::consts::DLL_PREFIX);
    let entries = fs::read_dir(deps).ok()?;
    for entry in entries.flatten() {
        let path = entry.path();
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            if name.starts_with(&prefix) && name.ends_with(env::consts::DLL_SUFFIX) {
                return Some(path);
            }
        }
    }
    None
}
