use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;

use crate::error::{AccessError, BatchError, DescribeError, WriteError};
use crate::models::{
    BatchRequest, BatchResult, DescriptionRecord, ErrorKind, FailedFile, ImageFile, RunState,
};
use crate::services::{
    build_prompt, check_access, execution_timer, filter_files_by_extension, read_caption,
    DescriptionClient, ProcessTimer, ResponseParser,
};

/// What a run does with each successfully described image.
pub trait BatchSink {
    /// `data` is the image content read at the start of the file's turn.
    fn accept(
        &mut self,
        image: &ImageFile,
        data: &Bytes,
        record: DescriptionRecord,
    ) -> Result<(), WriteError>;

    /// Called once when the loop ends, including after an abort. Returns the
    /// file the sink produced, if any.
    fn finish(&mut self, result: &BatchResult) -> Result<Option<PathBuf>, WriteError>;
}

/// Stop request shared with the front end. Checked between files only.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Per-file events of a run.
pub trait BatchProgress {
    fn started(&self, _position: usize, _total: usize, _image: &ImageFile) {}
    fn succeeded(&self, _image: &ImageFile) {}
    fn failed(&self, _failure: &FailedFile) {}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LogProgress;

impl BatchProgress for LogProgress {
    fn started(&self, position: usize, total: usize, image: &ImageFile) {
        log::info!("[{}/{}] Processing {}", position, total, image);
    }

    fn succeeded(&self, image: &ImageFile) {
        log::info!("Finished {}", image);
    }

    fn failed(&self, failure: &FailedFile) {
        log::error!(
            "Failed {} ({}): {}",
            failure.file,
            failure.kind,
            failure.reason
        );
    }
}

/// Sequential driver shared by both batch modes: one file is fully described,
/// parsed and handed to the sink before the next one starts.
pub struct BatchRunner<'a, C> {
    client: &'a C,
    parser: ResponseParser,
    extensions: Vec<String>,
    /// Used when the request carries no custom prompt.
    default_prompt: String,
    cancel: CancelFlag,
    progress: Box<dyn BatchProgress + 'a>,
    state: RunState,
}

impl<'a, C: DescriptionClient> BatchRunner<'a, C> {
    pub fn new(
        client: &'a C,
        parser: ResponseParser,
        extensions: Vec<String>,
        default_prompt: impl Into<String>,
    ) -> Self {
        Self {
            client,
            parser,
            extensions,
            default_prompt: default_prompt.into(),
            cancel: CancelFlag::new(),
            progress: Box::new(LogProgress),
            state: RunState::Idle,
        }
    }

    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_progress(mut self, progress: impl BatchProgress + 'a) -> Self {
        self.progress = Box::new(progress);
        self
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    fn transition(&mut self, next: RunState) {
        log::debug!("Batch state {} -> {}", self.state.as_str(), next.as_str());
        self.state = next;
    }

    pub async fn run(
        &mut self,
        request: &BatchRequest,
        sink: &mut impl BatchSink,
    ) -> Result<BatchResult, BatchError> {
        let timer = ProcessTimer::start();
        self.transition(RunState::Checking);

        let checked = self.collect_images(request).await;
        let images = match checked {
            Ok(images) => images,
            Err(cause) => {
                log::error!("Access check failed: {}", cause);
                self.transition(RunState::Aborted);
                let partial = BatchResult {
                    elapsed_time: timer.stop(),
                    ..BatchResult::default()
                };
                return Err(BatchError::Access { cause, partial });
            }
        };
        let prompt = request
            .custom_prompt
            .clone()
            .unwrap_or_else(|| self.default_prompt.clone());

        self.transition(RunState::Running);
        let mut result = BatchResult {
            total: images.len(),
            ..BatchResult::default()
        };
        log::info!(
            "Found {} image(s) in {}",
            result.total,
            request.source_directory.display()
        );

        let mut abort_cause: Option<DescribeError> = None;
        for (index, image) in images.iter().enumerate() {
            if self.cancel.is_cancelled() {
                log::warn!("Cancelled; {} file(s) left untouched", result.total - index);
                result.cancelled = true;
                result.skipped = result.total - index;
                break;
            }

            self.progress.started(index + 1, result.total, image);
            match self.process(image, &prompt, sink).await {
                Ok(()) => {
                    result.processed_count += 1;
                    self.progress.succeeded(image);
                }
                Err(failure) => {
                    self.progress.failed(&failure);
                    let fatal = match &failure.kind {
                        ErrorKind::AuthenticationFailed => Some(failure.reason.clone()),
                        _ => None,
                    };
                    result.failed.push(failure);
                    if let Some(reason) = fatal {
                        result.skipped = result.total - index - 1;
                        abort_cause = Some(DescribeError::AuthenticationFailed(reason));
                        break;
                    }
                }
            }
        }

        if abort_cause.is_some() {
            self.transition(RunState::Aborted);
        } else {
            self.transition(RunState::Finalizing);
        }

        let finished = sink.finish(&result);
        result.elapsed_time = timer.stop();
        execution_timer(
            result.processed_count,
            result.unprocessed_count(),
            result.elapsed_time,
        );

        match finished {
            Ok(output) => result.output = output,
            Err(cause) => {
                log::error!("{}", cause);
                if abort_cause.is_none() {
                    self.transition(RunState::Aborted);
                    return Err(BatchError::Finalize {
                        cause,
                        partial: result,
                    });
                }
            }
        }

        if let Some(cause) = abort_cause {
            return Err(BatchError::Aborted {
                cause,
                partial: result,
            });
        }

        self.transition(RunState::Done);
        Ok(result)
    }

    async fn collect_images(&self, request: &BatchRequest) -> Result<Vec<ImageFile>, AccessError> {
        check_access(&request.source_directory, &request.destination_directory).await?;
        filter_files_by_extension(&request.source_directory, &self.extensions).await
    }

    async fn process(
        &self,
        image: &ImageFile,
        base_prompt: &str,
        sink: &mut impl BatchSink,
    ) -> Result<(), FailedFile> {
        let data = tokio::fs::read(&image.path)
            .await
            .map(Bytes::from)
            .map_err(|err| {
                let message = format!("cannot read {}: {}", image.path.display(), err);
                failure(image, ErrorKind::InvalidImage, &message)
            })?;

        let caption = read_caption(&data);
        if caption.is_none() {
            log::debug!("{} has no caption; describing without context", image);
        }
        let prompt = build_prompt(base_prompt, caption.as_deref());

        let raw = self
            .client
            .describe(image, &data, &prompt)
            .await
            .map_err(|err| failure(image, err.kind(), &err))?;
        let record = self
            .parser
            .parse(&raw)
            .map_err(|err| failure(image, ErrorKind::ParseError, &err))?;
        sink.accept(image, &data, record)
            .map_err(|err| failure(image, ErrorKind::WriteError, &err))
    }
}

fn failure(image: &ImageFile, kind: ErrorKind, err: &dyn std::fmt::Display) -> FailedFile {
    FailedFile {
        file: image.clone(),
        kind,
        reason: err.to_string(),
    }
}
