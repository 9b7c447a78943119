//! Script execution engine.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, trace};

use super::artifact::{ArtifactEmitter, ArtifactLayout, ArtifactWriteFailure};
use super::result::ExecutionResult;
use super::variables;
use crate::backend::{Backend, BackendSession, Submission};
use crate::error::ScriptError;
use crate::files::{FilePreProcessor, FileSystem, LocalFileSystem, PreProcessor};
use crate::host::{ScriptHostContext, ScriptPack};
use crate::session::{SessionKey, SessionState, SessionStore};
use crate::Result;

/// Source of one submission.
enum Source<'a> {
    Script { path: &'a Path, working_dir: PathBuf },
    Code,
}

/// Runs scripts against sessions kept in a [`SessionStore`].
///
/// With artifacts enabled (see [`with_artifacts`](Self::with_artifacts))
/// every script execution also writes the compiled submission and its
/// symbols to a fixed path pair for external debuggers.
///
/// At most one execution runs per session key at a time; executions on
/// different keys run in parallel.
pub struct ScriptExecutor<B: Backend> {
    backend: B,
    store: Arc<SessionStore<B::Session>>,
    fs: Arc<dyn FileSystem>,
    preprocessor: Arc<dyn PreProcessor>,
    emitter: Option<ArtifactEmitter>,
}

impl<B: Backend> ScriptExecutor<B> {
    /// Create an executor from its collaborators.
    pub fn new(
        backend: B,
        store: Arc<SessionStore<B::Session>>,
        fs: Arc<dyn FileSystem>,
        preprocessor: Arc<dyn PreProcessor>,
    ) -> Self {
        Self {
            backend,
            store,
            fs,
            preprocessor,
            emitter: None,
        }
    }

    /// Create an executor on the local file system with its own store.
    pub fn local(backend: B) -> Self {
        let fs: Arc<dyn FileSystem> = Arc::new(LocalFileSystem::new());
        let preprocessor = Arc::new(FilePreProcessor::new(Arc::clone(&fs)));
        Self::new(backend, Arc::new(SessionStore::new()), fs, preprocessor)
    }

    /// Enable debug artifact emission.
    pub fn with_artifacts(mut self, layout: ArtifactLayout) -> Self {
        self.emitter = Some(ArtifactEmitter::new(layout));
        self
    }

    /// Check whether artifacts are emitted.
    pub fn emits_artifacts(&self) -> bool {
        self.emitter.is_some()
    }

    /// The store this executor records sessions in.
    pub fn store(&self) -> &Arc<SessionStore<B::Session>> {
        &self.store
    }

    /// Execute a script file.
    ///
    /// With `key`, an existing session under that key is resumed. Without
    /// one a fresh session is always created and stored under the default
    /// key.
    pub fn execute(
        &self,
        script: &Path,
        args: &[String],
        packs: &[Arc<dyn ScriptPack>],
        key: Option<&SessionKey>,
    ) -> Result<ExecutionResult> {
        let working_dir = self.fs.working_directory(script);
        let source = self.preprocessor.process_file(script)?;
        trace!(script = %script.display(), working_dir = %working_dir.display(), "processed script");

        self.submit(
            Source::Script {
                path: script,
                working_dir,
            },
            &source,
            args,
            packs,
            key,
        )
    }

    /// Execute in-memory source text. Never emits artifacts.
    pub fn execute_code(
        &self,
        code: &str,
        args: &[String],
        packs: &[Arc<dyn ScriptPack>],
        key: Option<&SessionKey>,
    ) -> Result<ExecutionResult> {
        self.submit(Source::Code, code, args, packs, key)
    }

    /// List the variables of a session as `"{type} {name}"` strings.
    pub fn list_variables(&self, key: &SessionKey) -> Vec<String> {
        variables::list_variables(&self.store, key)
    }

    fn submit(
        &self,
        source: Source<'_>,
        text: &str,
        args: &[String],
        packs: &[Arc<dyn ScriptPack>],
        key: Option<&SessionKey>,
    ) -> Result<ExecutionResult> {
        let start = Instant::now();
        let resume = key.is_some();
        let key = key.cloned().unwrap_or_default();

        let slot = self.store.slot(&key)?;
        let mut guard = slot.lock().map_err(|_| ScriptError::LockPoisoned)?;

        let (mut state, resumed) = match guard.take() {
            Some(state) if resume => (state, true),
            previous => {
                *guard = previous;
                let host = ScriptHostContext::new(args.iter().cloned(), packs.to_vec());
                let session = self
                    .backend
                    .create_session(host)
                    .map_err(|e| ScriptError::Backend(e.to_string()))?;
                (SessionState::new(session), false)
            }
        };
        debug!(session = %key, resumed, "submitting");

        let submission = match state.session_mut().compile_submission(text) {
            Ok(submission) => submission,
            Err(diagnostics) => {
                if resumed {
                    *guard = Some(state);
                }
                return Err(ScriptError::Compilation { diagnostics });
            }
        };
        let diagnostics = submission.diagnostics().to_vec();

        let artifacts = match (&self.emitter, &source) {
            (Some(emitter), Source::Script { path, working_dir }) => {
                Some(emitter.emit(self.fs.as_ref(), working_dir, path, &submission))
            }
            _ => None,
        };

        let outcome = state.session_mut().execute(submission);
        *guard = Some(state.advance(outcome.as_ref().ok().cloned()));
        drop(guard);

        let value = match outcome {
            Ok(value) => value,
            Err(source) => {
                return Err(ScriptError::ExecutionFault {
                    source,
                    artifact: artifacts.and_then(std::result::Result::err).map(Box::new),
                });
            }
        };
        debug!(session = %key, elapsed = ?start.elapsed(), "submission executed");

        let mut result = ExecutionResult::new(value, key, start.elapsed())
            .resumed(resumed)
            .with_diagnostics(diagnostics);

        match artifacts {
            Some(Ok(paths)) => result.artifacts = Some(paths),
            Some(Err(ArtifactWriteFailure { path, source })) => {
                return Err(ScriptError::ArtifactWrite {
                    path,
                    source,
                    result: Box::new(result),
                });
            }
            None => {}
        }

        Ok(result)
    }
}

impl<B: Backend + 'static> ScriptExecutor<B> {
    /// Execute a script on the blocking thread pool.
    ///
    /// Compilation and execution are CPU-bound, so this keeps them off the
    /// async workers. There is no cancellation: the script runs to
    /// completion or fault.
    pub async fn execute_async(
        self: Arc<Self>,
        script: PathBuf,
        args: Vec<String>,
        packs: Vec<Arc<dyn ScriptPack>>,
        key: Option<SessionKey>,
    ) -> Result<ExecutionResult> {
        tokio::task::spawn_blocking(move || self.execute(&script, &args, &packs, key.as_ref()))
            .await
            .map_err(|e| ScriptError::Task(e.to_string()))?
    }
}
