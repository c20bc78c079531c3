use indicatif::{MultiProgress, ProgressBar as InnerProgressBar, ProgressStyle};

const TEMPLATE: &str = "{prefix:>.bold}\n[{bar:40.cyan/blue}] {pos}/{len}: {msg} ({eta})";

/// A bar registered with the shared [`MultiProgress`] so log lines print above it.
#[derive(Debug, Clone)]
pub struct ProgressBar {
    inner: InnerProgressBar,
}

impl ProgressBar {
    pub fn new(mp: MultiProgress, prefix: &str, len: usize) -> Self {
        let inner = mp.add(InnerProgressBar::new(len as u64));

        let style = ProgressStyle::with_template(TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>");
        inner.set_style(style);
        inner.set_prefix(prefix.to_string());

        inner.tick();

        Self { inner }
    }

    pub fn set_msg(&self, msg: impl Into<String>) {
        self.inner.set_message(msg.into());
    }

    pub fn inc(&self, delta: u64) {
        self.inner.inc(delta);
    }

    pub fn finish(&self) {
        self.inner.finish_and_clear();
    }
}
