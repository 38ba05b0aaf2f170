use std::time::Instant;

use tracing::{error, info, warn};

pub mod cache;
pub mod command;
pub mod error;
pub mod formatter;
pub mod job;
pub mod paths;
pub mod runner;
pub mod stats;
pub mod workspace;


use cache::JobResultCache;
use command::EngineCommand;
use error::LzwError;
use job::{Job, JobResult, JobSettings, Upload};
use paths::JobPaths;
use runner::Engine;
use workspace::Workspace;

/// Turns a control-surface submission into a job. Nothing is staged and the
/// engine is not touched when this fails.
pub fn prepare(upload: Option<Upload>, settings: JobSettings) -> Result<(Job, Upload), LzwError> {
    let upload = upload.ok_or(LzwError::MissingInput)?;
    let job = Job::new(upload.filename.clone(), settings)?;
    Ok((job, upload))
}

/// Stages the upload, runs the engine and classifies the outcome. Every
/// failure past validation ends up as a failed `JobResult`.
pub fn execute(workspace: &Workspace, engine: &dyn Engine, job: &Job, bytes: &[u8]) -> JobResult {
    let started = Instant::now();
    let paths = paths::resolve(workspace, job.original_filename(), job.direction());
    info!(
        file = job.original_filename(),
        direction = %job.direction(),
        max_bits = %job.max_bits(),
        fixed = job.fixed_table(),
        stats = job.collect_stats(),
        "job started"
    );

    match stage_and_invoke(workspace, engine, job, &paths, bytes) {
        Ok(()) => {
            if !paths.result.exists() {
                warn!(
                    path = %paths.result.display(),
                    "engine exited successfully but the expected artifact is missing"
                );
            }
            let stats = job.collect_stats().then_some(paths.stats);
            let elapsed = started.elapsed();
            info!(result = %paths.result.display(), elapsed_ms = elapsed.as_millis() as u64, "job finished");
            JobResult::success(job, paths.result, stats, elapsed)
        }
        Err(err) => {
            if matches!(err, LzwError::Staging { .. }) {
                error!(%err, "failed to stage upload");
            } else {
                warn!(%err, "job failed");
            }
            JobResult::failure(job, err.diagnostic(), started.elapsed())
        }
    }
}

fn stage_and_invoke(
    workspace: &Workspace,
    engine: &dyn Engine,
    job: &Job,
    paths: &JobPaths,
    bytes: &[u8],
) -> Result<(), LzwError> {
    workspace.ensure_all()?;
    workspace.stage(&paths.staging, bytes)?;
    let command = EngineCommand::for_job(job, paths.relative_input.clone());
    engine.invoke(&command, workspace.root())
}

/// Full submission path for one session: validate, run, record.
pub fn submit<'c>(
    cache: &'c mut JobResultCache,
    workspace: &Workspace,
    engine: &dyn Engine,
    upload: Option<Upload>,
    settings: JobSettings,
) -> Result<&'c JobResult, LzwError> {
    let (job, upload) = prepare(upload, settings).map_err(|err| {
        warn!(%err, "submission rejected");
        err
    })?;
    let result = execute(workspace, engine, &job, &upload.bytes);
    Ok(cache.record(result))
}
