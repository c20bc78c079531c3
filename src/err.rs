use std::fmt::Write;

/// Renders an error and every cause below it, one per line.
pub fn format_anyhow_chain(err: &anyhow::Error) -> String {
    let mut output = err.to_string();
    for cause in err.chain().skip(1) {
        let _ = write!(output, "\nCaused by: {cause}");
    }

    output
}
