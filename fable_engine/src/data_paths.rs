use std::env;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// Cached path to the directory containing the engine's runtime data files.
static DATA_ROOT: LazyLock<PathBuf> = LazyLock::new(detect_data_root);

/// Construct a data path relative to the resolved data root.
pub fn data_path(relative: impl AsRef<Path>) -> PathBuf {
    DATA_ROOT.join(relative)
}

/// Resolve the most likely location of the runtime data directory.
fn detect_data_root() -> PathBuf {
    let mut candidates = vec![PathBuf::from("fable_engine/data"), PathBuf::from("data")];

    if let Ok(exe_path) = env::current_exe()
        && let Some(dir) = exe_path.parent()
    {
        candidates.extend(data_candidates_near(dir));
        if let Some(parent) = dir.parent() {
            candidates.extend(data_candidates_near(parent));
        }
    }

    candidates
        .into_iter()
        .find(|candidate| candidate.is_dir())
        .unwrap_or_else(|| PathBuf::from("fable_engine/data"))
}

fn data_candidates_near(dir: &Path) -> [PathBuf; 2] {
    [dir.join("fable_engine/data"), dir.join("data")]
}
