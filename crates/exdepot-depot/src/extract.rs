//! Parallel extraction of a depot into a directory tree.
//!
//! Directories are created first, sequentially, so every file's parent
//! exists before any worker runs. Files are then handed to a pool of scoped
//! worker threads over a bounded channel; each job's result comes back on a
//! second channel and is collected on the calling thread.

use std::fs::{self, File};
use std::io::BufWriter;
use std::num::NonZeroUsize;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use crossbeam_channel::{Receiver, Sender};
use tracing::{debug, info, warn};

use crate::blob::ChunkSource;
use crate::index::{Index, IndexEntry};
use crate::manifest::{Manifest, PATH_SEPARATOR};
use crate::{Error, Result};

/// What to do when a file fails to extract.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Stop dispatching jobs and return the first failure as an error.
    #[default]
    AbortOnFirst,
    /// Keep going and report every failure in [`ExtractReport::failures`].
    CollectAll,
}

/// Extraction settings.
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    /// Number of worker threads.
    pub workers: usize,
    /// Job queue capacity. Zero makes every hand-off wait for a free worker.
    pub queue_depth: usize,
    pub policy: FailurePolicy,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            workers: thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(1),
            queue_depth: 0,
            policy: FailurePolicy::default(),
        }
    }
}

impl ExtractOptions {
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_queue_depth(mut self, queue_depth: usize) -> Self {
        self.queue_depth = queue_depth;
        self
    }

    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }
}

/// Result of one file job, passed to the progress callback.
#[derive(Debug)]
pub struct JobOutcome {
    pub path: PathBuf,
    pub id: u32,
    /// Bytes written on success.
    pub result: Result<u64>,
}

/// A file that failed to extract.
#[derive(Debug)]
pub struct JobFailure {
    pub path: PathBuf,
    pub id: u32,
    pub error: Error,
}

impl JobFailure {
    pub fn into_error(self) -> Error {
        Error::Job {
            path: self.path,
            id: self.id,
            source: Box::new(self.error),
        }
    }
}

/// Summary of an extraction run.
#[derive(Debug, Default)]
pub struct ExtractReport {
    pub directories: usize,
    pub files: usize,
    pub bytes: u64,
    pub failures: Vec<JobFailure>,
}

impl ExtractReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

struct Job<'a> {
    path: PathBuf,
    id: u32,
    entry: Option<&'a IndexEntry>,
}

/// Extracts every item of a manifest from a shared chunk source.
pub struct Extractor<'a, S: ChunkSource + ?Sized> {
    manifest: &'a Manifest,
    index: &'a Index,
    source: &'a S,
    key: Option<&'a [u8]>,
    options: ExtractOptions,
}

impl<'a, S: ChunkSource + ?Sized> Extractor<'a, S> {
    pub fn new(
        manifest: &'a Manifest,
        index: &'a Index,
        source: &'a S,
        key: Option<&'a [u8]>,
    ) -> Self {
        Self {
            manifest,
            index,
            source,
            key,
            options: ExtractOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ExtractOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &ExtractOptions {
        &self.options
    }

    /// Extract everything under `out`.
    pub fn run(&self, out: &Path) -> Result<ExtractReport> {
        self.run_with_progress(out, |_| {})
    }

    /// Extract everything under `out`, calling `progress` once per finished
    /// file on the calling thread.
    pub fn run_with_progress<F>(&self, out: &Path, mut progress: F) -> Result<ExtractReport>
    where
        F: FnMut(&JobOutcome),
    {
        let mut report = ExtractReport::default();

        // Resolve every output path before touching the filesystem.
        let directories = self
            .manifest
            .directories()
            .map(|dir| output_path(out, dir.path()))
            .collect::<Result<Vec<_>>>()?;
        let jobs = self
            .manifest
            .files()
            .map(|item| -> Result<Job<'_>> {
                Ok(Job {
                    path: output_path(out, item.path())?,
                    id: item.id(),
                    entry: self.index.get(u64::from(item.id())),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        create_dir(out)?;
        for dir in &directories {
            create_dir(dir)?;
            report.directories += 1;
        }

        let workers = self.options.workers.max(1);
        let policy = self.options.policy;
        info!(
            directories = report.directories,
            files = jobs.len(),
            workers,
            output = %out.display(),
            "extracting depot"
        );

        let abort = AtomicBool::new(false);
        let (job_tx, job_rx) = crossbeam_channel::bounded::<Job<'_>>(self.options.queue_depth);
        let (result_tx, result_rx) = crossbeam_channel::unbounded::<JobOutcome>();

        thread::scope(|scope| {
            for _ in 0..workers {
                let receiver = job_rx.clone();
                let results = result_tx.clone();
                let abort = &abort;
                scope.spawn(move || self.worker(receiver, results, abort));
            }
            drop(job_rx);
            drop(result_tx);

            let abort = &abort;
            scope.spawn(move || {
                for job in jobs {
                    if abort.load(Ordering::Relaxed) {
                        debug!("job dispatch stopped");
                        break;
                    }
                    if job_tx.send(job).is_err() {
                        break;
                    }
                }
            });

            for outcome in result_rx {
                progress(&outcome);

                match outcome.result {
                    Ok(bytes) => {
                        report.files += 1;
                        report.bytes += bytes;
                    }
                    Err(error) => {
                        if policy == FailurePolicy::AbortOnFirst {
                            abort.store(true, Ordering::Relaxed);
                        }
                        report.failures.push(JobFailure {
                            path: outcome.path,
                            id: outcome.id,
                            error,
                        });
                    }
                }
            }
        });

        info!(
            files = report.files,
            bytes = report.bytes,
            failures = report.failures.len(),
            "extraction finished"
        );

        if policy == FailurePolicy::AbortOnFirst && !report.failures.is_empty() {
            let first = report.failures.swap_remove(0);
            return Err(first.into_error());
        }

        Ok(report)
    }

    fn worker(&self, jobs: Receiver<Job<'a>>, results: Sender<JobOutcome>, abort: &AtomicBool) {
        for job in jobs {
            // Drain without work once aborted so the producer never blocks.
            if abort.load(Ordering::Relaxed) {
                continue;
            }

            let result = self.extract_file(&job.path, job.id, job.entry);
            let outcome = JobOutcome {
                path: job.path,
                id: job.id,
                result,
            };
            if results.send(outcome).is_err() {
                break;
            }
        }
    }

    fn extract_file(&self, path: &Path, id: u32, entry: Option<&IndexEntry>) -> Result<u64> {
        let mut writer = BufWriter::new(File::create(path)?);

        let written = match entry {
            Some(entry) => entry.reader(self.source, self.key).write_into(&mut writer)?,
            None => {
                warn!(id, path = %path.display(), "no index entry, writing empty file");
                0
            }
        };

        let file = writer.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()?;

        Ok(written)
    }
}

/// Join a manifest path onto `out` one component at a time.
///
/// Empty and `.` components are skipped. `..`, root and prefix components
/// are rejected so no item can land outside `out`.
fn output_path(out: &Path, item_path: &str) -> Result<PathBuf> {
    let mut path = out.to_path_buf();

    for segment in item_path.split(PATH_SEPARATOR) {
        for component in Path::new(segment).components() {
            match component {
                Component::Normal(name) => path.push(name),
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return Err(Error::UnsafePath {
                        path: item_path.to_owned(),
                    });
                }
            }
        }
    }

    Ok(path)
}

fn create_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).map_err(|source| Error::CreateDirectory {
        path: path.to_path_buf(),
        source,
    })
}
