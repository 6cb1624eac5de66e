use indicatif::{ProgressBar, ProgressStyle};

/// Progress bar for long preprocessing phases. Hidden unless `visible`, so
/// library callers stay quiet by default.
pub fn get_progressbar_long_jobs(job_name: &str, len: u64, visible: bool) -> ProgressBar {
    let bar = if visible {
        ProgressBar::new(len)
    } else {
        ProgressBar::hidden()
    };
    bar.set_message(job_name.to_string());
    if let Ok(style) = ProgressStyle::with_template(" {msg} {wide_bar} estimated remaining: {eta_precise}") {
        bar.set_style(style);
    }
    bar
}
