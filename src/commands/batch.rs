use super::render_source;
use crate::{
    cli::BatchArgs,
    config::{Config, Input},
    progress_bar::ProgressBar,
    source::Source,
};
use anyhow::bail;
use fs_err::tokio as fs;
use indicatif::MultiProgress;
use log::{debug, info, warn};
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};
use svg2png::{ConversionRequest, Converter};
use tokio::{sync::Semaphore, task::JoinSet};
use walkdir::WalkDir;

struct Job {
    source: PathBuf,
    output: PathBuf,
    request: ConversionRequest,
}

pub async fn batch(args: BatchArgs, multi_progress: MultiProgress) -> anyhow::Result<()> {
    let config = Config::read(&args.config).await?;
    if config.inputs.is_empty() {
        bail!("No inputs configured in {}", args.config.display());
    }

    let converter = Converter::new(config.options()?);
    let client = reqwest::Client::new();
    let semaphore = Arc::new(Semaphore::new(args.jobs.max(1)));

    let mut failed = 0;
    let mut converted = 0;

    for (input_name, input) in &config.inputs {
        let jobs = collect(input);
        if jobs.is_empty() {
            warn!("Input \"{input_name}\" matched no files");
            continue;
        }

        let pb = ProgressBar::new(
            multi_progress.clone(),
            &format!("Converting input \"{input_name}\""),
            jobs.len(),
        );

        let mut set = JoinSet::new();
        for job in jobs {
            let permit = semaphore.clone().acquire_owned().await?;
            let client = client.clone();
            let converter = converter.clone();
            set.spawn(async move {
                let result = run(&client, &converter, &job).await;
                drop(permit);
                (job.source, result)
            });
        }

        while let Some(joined) = set.join_next().await {
            let (path, result) = joined?;
            pb.set_msg(path.display().to_string());
            match result {
                Ok(()) => converted += 1,
                Err(err) => {
                    warn!(
                        "Skipping file {} because it failed converting: {}",
                        path.display(),
                        crate::err::format_anyhow_chain(&err)
                    );
                    failed += 1;
                }
            }
            pb.inc(1);
        }

        pb.finish();
    }

    info!("Converted {converted} files");

    if failed > 0 {
        bail!("{failed} files failed to convert");
    }

    Ok(())
}

fn collect(input: &Input) -> Vec<Job> {
    let prefix = input.path.get_prefix();
    let request = input.request();

    WalkDir::new(&prefix)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file() && input.path.is_match(entry.path()))
        .map(|entry| {
            let source = entry.path().to_path_buf();
            let output = input
                .output_path
                .join(relative_path(&prefix, &source))
                .with_extension("png");
            Job {
                source,
                output,
                request,
            }
        })
        .collect()
}

/// `source` relative to the walk root; just the file name when the root is
/// the file itself.
fn relative_path(prefix: &Path, source: &Path) -> PathBuf {
    match source.strip_prefix(prefix) {
        Ok(rel) if !rel.as_os_str().is_empty() => rel.to_path_buf(),
        _ => source.file_name().map(PathBuf::from).unwrap_or_default(),
    }
}

async fn run(client: &reqwest::Client, converter: &Converter, job: &Job) -> anyhow::Result<()> {
    let source = Source::File(job.source.clone());
    let png = render_source(client, converter, &source, job.request).await?;

    if let Some(parent) = job.output.parent() {
        fs::create_dir_all(parent).await?;
    }
    fs::write(&job.output, &png).await?;

    debug!("{} -> {}", job.source.display(), job.output.display());
    Ok(())
}
