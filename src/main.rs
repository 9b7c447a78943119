//! script-session binary entry point.

use std::io;
use std::process::ExitCode;
use std::sync::Arc;

use script_session::cli::{self, Args};
use script_session::config::Config;
use script_session::repl::Repl;
use script_session::{logging, CalcBackend, ScriptError, ScriptExecutor, SessionKey};
use tracing::{debug, info, warn};

#[tokio::main]
async fn main() -> ExitCode {
    let args = match cli::parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("error: {}", e);
            eprintln!("Run 'script-session --help' for usage.");
            return ExitCode::from(2);
        }
    };

    if args.help {
        cli::print_help();
        return ExitCode::SUCCESS;
    }
    if args.version {
        cli::print_version();
        return ExitCode::SUCCESS;
    }

    let config = match Config::load(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::from(2);
        }
    };

    if let Err(e) = logging::init_with_filter(config.log_filter()) {
        eprintln!("warning: logging already initialized: {}", e);
    }
    info!("script-session v{}", env!("CARGO_PKG_VERSION"));

    let mut executor = ScriptExecutor::local(CalcBackend);
    if let Some(layout) = config.artifact_layout() {
        debug!(output_dir = %layout.output_dir, "debug artifacts enabled");
        executor = executor.with_artifacts(layout);
    }

    // Scripts on one command line share a session.
    let key = config.session_key().unwrap_or_else(SessionKey::generate);

    if args.scripts.is_empty() {
        // Reading stdin blocks, so keep it off the async workers.
        return tokio::task::spawn_blocking(move || run_prompt(&executor, key, &args))
            .await
            .unwrap_or_else(|e| {
                eprintln!("error: prompt task failed: {}", e);
                ExitCode::FAILURE
            });
    }

    run_scripts(Arc::new(executor), key, args).await
}

async fn run_scripts(executor: Arc<ScriptExecutor<CalcBackend>>, key: SessionKey, args: Args) -> ExitCode {
    for script in &args.scripts {
        info!(script = %script.display(), session = %key, "executing");

        let outcome = Arc::clone(&executor)
            .execute_async(
                script.clone(),
                args.script_args.clone(),
                Vec::new(),
                Some(key.clone()),
            )
            .await;

        let result = match outcome {
            Ok(result) => result,
            Err(ScriptError::ArtifactWrite {
                path,
                source,
                result,
            }) => {
                warn!(path = %path.display(), error = %source, "artifact write failed");
                eprintln!("warning: failed to write {}: {}", path.display(), source);
                *result
            }
            Err(e) => {
                eprintln!("{}: {}", script.display(), e);
                return ExitCode::FAILURE;
            }
        };

        for diagnostic in &result.diagnostics {
            eprintln!("{}{}", script.display(), diagnostic);
        }
        if result.has_value() {
            println!("{}", result.value);
        }
        if let Some(ref artifacts) = result.artifacts {
            debug!(code = %artifacts.code.display(), symbols = %artifacts.symbols.display(), "artifacts");
        }
    }

    for variable in executor.list_variables(&key) {
        println!("{}", variable);
    }

    ExitCode::SUCCESS
}

fn run_prompt(executor: &ScriptExecutor<CalcBackend>, key: SessionKey, args: &Args) -> ExitCode {
    let repl = Repl::new(executor, key).with_args(args.script_args.clone());
    debug!(session = %repl.key(), "starting prompt");

    let stdin = io::stdin();
    match repl.run(stdin.lock(), io::stdout()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}
