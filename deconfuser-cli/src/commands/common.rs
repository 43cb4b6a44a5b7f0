use std::path::Path;

use rayon::prelude::*;

/// Extract a display-friendly filename from a path.
pub fn file_display_name(path: &Path) -> String {
    path.file_name().map_or_else(
        || path.display().to_string(),
        |f| f.to_string_lossy().to_string(),
    )
}

/// Run `f` on every file in parallel, keeping input order.
///
/// Failures are printed to stderr and counted; the successful results are returned with the
/// number of failures.
pub fn process_files<T, F>(paths: &[impl AsRef<Path> + Sync], f: F) -> (Vec<T>, usize)
where
    T: Send,
    F: Fn(&Path) -> anyhow::Result<T> + Sync,
{
    let outcomes: Vec<anyhow::Result<T>> = paths.par_iter().map(|p| f(p.as_ref())).collect();

    let mut results = Vec::with_capacity(outcomes.len());
    let mut failures = 0;
    for (path, outcome) in paths.iter().zip(outcomes) {
        match outcome {
            Ok(result) => results.push(result),
            Err(e) => {
                eprintln!("{}: {e:#}", file_display_name(path.as_ref()));
                failures += 1;
            }
        }
    }
    (results, failures)
}
