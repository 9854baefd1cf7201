//! Small helpers shared by the command handlers.

use std::path::{Path, PathBuf};

use indicatif::{ProgressBar, ProgressStyle};
use pirt_core::classify::PiwiClass;

/// Output file name, decorated with the piwi-filter suffix the analysis ran
/// under.
pub fn decorated_path(base: &str, class: PiwiClass, extension: &str) -> PathBuf {
    let suffix = match class {
        PiwiClass::All => "",
        PiwiClass::Primary => "-U1",
        PiwiClass::Secondary => "-A10",
    };
    PathBuf::from(format!("{base}{suffix}.{extension}"))
}

/// The file name without its directory, for labeling outputs.
pub fn basename(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// A coarse-grained record spinner in the house style.
pub fn record_spinner(message: &str) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg} ({pos} records)")
            .unwrap(),
    );
    bar.set_message(message.to_string());
    bar
}

/// Count records through a shared spinner, updating it once per million so
/// the bar never becomes the bottleneck.
pub fn with_progress<I>(records: I, bar: ProgressBar) -> impl Iterator<Item = I::Item> + Send
where
    I: Iterator + Send,
{
    let mut pending = 0u64;
    records.inspect(move |_| {
        pending += 1;
        if pending == 1_000_000 {
            bar.inc(pending);
            pending = 0;
        }
    })
}
