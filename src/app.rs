use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::cli::{parse_cli_args, usage_text, version_text, CliCommand};
use crate::command_handlers::{
    handle_discovered, handle_promote, handle_purge, handle_scan, handle_scan_all,
};
use crate::database::Database;

/// Receives each line the app would print to stdout
pub type OutputHook = Arc<dyn Fn(&str) + Send + Sync>;

/// Where commands read from and write to
#[derive(Clone)]
pub struct AppContext {
    db_path: PathBuf,
    output_hook: Option<OutputHook>,
    cancel: CancellationToken,
}

impl AppContext {
    /// Database path from `RACKSCAN_DB_PATH` or the platform default, stdout output
    pub fn from_env() -> Self {
        Self {
            db_path: Database::default_path(),
            output_hook: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_db_path(mut self, path: PathBuf) -> Self {
        self.db_path = path;
        self
    }

    pub fn with_output_hook(mut self, hook: OutputHook) -> Self {
        self.output_hook = Some(hook);
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn db_path(&self) -> &PathBuf {
        &self.db_path
    }

    /// Token that stops running scans when cancelled
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub(crate) fn emit(&self, text: &str) {
        match &self.output_hook {
            Some(hook) => hook(text),
            None => println!("{}", text),
        }
    }
}

/// Run the app by parsing CLI-style args and dispatching the command.
pub async fn run<I, S>(args: I) -> Result<()>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    run_with_context(args, &AppContext::from_env()).await
}

pub async fn run_with_context<I, S>(args: I, context: &AppContext) -> Result<()>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let command = parse_cli_args(args)?;
    execute_command_with_context(command, context).await
}

/// Execute a pre-parsed command. This is reusable for non-CLI entrypoints.
pub async fn execute_command_with_context(command: CliCommand, context: &AppContext) -> Result<()> {
    match command {
        CliCommand::Help => {
            context.emit(&usage_text());
            Ok(())
        }
        CliCommand::Version => {
            context.emit(&version_text());
            Ok(())
        }
        CliCommand::Scan { network_id } => handle_scan(context, network_id).await,
        CliCommand::ScanAll => handle_scan_all(context).await,
        CliCommand::Discovered { network_id } => handle_discovered(context, network_id),
        CliCommand::Promote {
            discovered_id,
            name,
            datacenter_id,
        } => handle_promote(context, discovered_id, name, datacenter_id),
        CliCommand::Purge { days } => handle_purge(context, days),
    }
}
