use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::json;

use docpipe::api::{ApiRequest, ApiResponse, DocumentApi};
use docpipe::db::{audit_repo, document_repo, Database};
use docpipe::error::{ConfigError, DocpipeError};
use docpipe::pipeline::{PipelineConfig, PipelineContext};
use docpipe::store::{FsObjectStore, ObjectStore};
use docpipe::worker::Service;
use docpipe::{config, logging, Config};

#[derive(Parser)]
#[command(
    name = "docpipe",
    about = "Document ingestion pipeline: register, upload, process",
    version
)]
struct Cli {
    /// Path to a JSON config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Watch the bucket and process the change feed until interrupted
    Serve,
    /// Register a new document and print its upload location
    Register { filename: String },
    /// Print a document's metadata record
    Get { document_id: String },
    /// Print a document's audit trail
    History { document_id: String },
    /// Store a local file at a registered document's upload key
    Upload { document_id: String, file: PathBuf },
    /// Ingest pending uploads and drain the change feed once
    Drain,
}

struct App {
    config: Config,
    db: Database,
    objects: Arc<FsObjectStore>,
}

impl App {
    fn open(config: Config) -> Result<Self, DocpipeError> {
        let db_path = config
            .resolved_database_path()
            .ok_or_else(|| ConfigError::Validation {
                message: "database_path could not be resolved".to_string(),
            })?;
        let db = Database::open(&db_path, Duration::from_millis(config.timeouts.store_ms))?;
        let objects = Arc::new(FsObjectStore::new(&config.storage.root));
        Ok(Self {
            config,
            db,
            objects,
        })
    }

    fn context(&self) -> PipelineContext {
        PipelineContext::new(
            self.db.clone(),
            self.objects.clone(),
            PipelineConfig::from_config(&self.config),
        )
    }

    fn api(&self) -> DocumentApi {
        DocumentApi::new(self.db.clone(), self.config.storage.bucket.clone())
    }

    fn service(&self) -> Service {
        Service::new(
            self.context(),
            &self.config.storage.root,
            self.config.workers.clone(),
        )
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match config::resolve_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = logging::init(&config.logging) {
        eprintln!("Error: {}", e);
        return ExitCode::FAILURE;
    }

    match run(cli.command, config) {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "Command failed");
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(command: Command, config: Config) -> Result<ExitCode, DocpipeError> {
    let app = App::open(config)?;

    match command {
        Command::Serve => {
            let shutdown = Arc::new(AtomicBool::new(false));
            let flag = Arc::clone(&shutdown);
            if let Err(e) = ctrlc::set_handler(move || flag.store(true, Ordering::Relaxed)) {
                tracing::warn!(error = %e, "Failed to install interrupt handler");
            }
            app.service().run(shutdown)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Register { filename } => {
            let body = json!({ "filename": filename }).to_string();
            Ok(respond(app.api().handle(&ApiRequest::register(body))))
        }
        Command::Get { document_id } => {
            Ok(respond(app.api().handle(&ApiRequest::get(document_id))))
        }
        Command::History { document_id } => {
            if document_repo::find(&app.db, &document_id)?.is_none() {
                return Err(DocpipeError::DocumentNotFound(document_id));
            }
            let entries = audit_repo::list_for_document(&app.db, &document_id)?;
            print_json(&json!({ "document_id": document_id, "entries": entries }));
            Ok(ExitCode::SUCCESS)
        }
        Command::Upload { document_id, file } => {
            let record = document_repo::find(&app.db, &document_id)?
                .ok_or_else(|| DocpipeError::DocumentNotFound(document_id.clone()))?;
            let body = std::fs::read(&file).map_err(|e| DocpipeError::ReadInput {
                path: file.clone(),
                source: e,
            })?;
            let location = app.objects.put(&record.bucket, &record.s3_key, &body)?;
            print_json(&json!({
                "document_id": document_id,
                "bucket": location.bucket,
                "s3_key": location.key,
                "size": body.len(),
            }));
            Ok(ExitCode::SUCCESS)
        }
        Command::Drain => {
            let report = app.service().drain_once()?;
            print_json(&json!({
                "notifications": report.notifications,
                "uploaded": report.ingest.uploaded,
                "already_handled": report.ingest.already_handled,
                "skipped": report.ingest.skipped,
                "failed": report.failed,
                "changes": report.changes,
            }));
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn respond(response: ApiResponse) -> ExitCode {
    print_json(&response.body);
    if response.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{}", s),
        Err(e) => eprintln!("Error: failed to render output: {}", e),
    }
}
