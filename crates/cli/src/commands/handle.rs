use std::io;
use std::path::PathBuf;

use clap::Args;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{info, Instrument};
use uuid::Uuid;

use textagent_core::config::{AppConfig, LoadOptions};
use textagent_core::secrets::EnvSecretStore;
use textagent_core::{ActionRequest, ActionResponse};

use crate::bootstrap::{bootstrap_with_config, ServiceKind, ServiceRouter};
use crate::commands::{current_thread_runtime, CommandResult};
use crate::logging::init_logging;

#[derive(Debug, Clone, Args)]
pub struct HandleArgs {
    #[arg(long, value_enum, help = "Which action group this process serves")]
    pub service: ServiceKind,
    #[arg(long, help = "Read the request from a file instead of stdin")]
    pub input: Option<PathBuf>,
    #[arg(long, help = "Correlation id attached to every log line for this invocation")]
    pub request_id: Option<String>,
    #[arg(long, help = "Treat each non-blank input line as a separate request")]
    pub lines: bool,
}

pub fn run(options: LoadOptions, args: HandleArgs) -> CommandResult {
    let config = match AppConfig::load(options) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "handle",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };
    init_logging(&config.logging);

    let runtime = match current_thread_runtime("handle") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let request_id = args.request_id.clone().unwrap_or_else(|| Uuid::new_v4().to_string());

    runtime.block_on(async move {
        let app = match bootstrap_with_config(config, args.service, &EnvSecretStore).await {
            Ok(app) => app,
            Err(error) => {
                return CommandResult::failure(
                    "handle",
                    error.error_class(),
                    error.to_string(),
                    error.exit_code(),
                );
            }
        };

        let mut stdout = tokio::io::stdout();
        let processed = match &args.input {
            Some(path) => match tokio::fs::File::open(path).await {
                Ok(file) => {
                    let reader = BufReader::new(file);
                    process_input(&app.router, reader, &mut stdout, args.lines, &request_id).await
                }
                Err(error) => Err(error),
            },
            None => {
                let reader = BufReader::new(tokio::io::stdin());
                process_input(&app.router, reader, &mut stdout, args.lines, &request_id).await
            }
        };
        app.db_pool.close().await;

        match processed {
            Ok(count) => {
                info!(
                    event_name = "system.handle.completed",
                    correlation_id = %request_id,
                    requests = count,
                    "finished handling input"
                );
                CommandResult::silent()
            }
            Err(error) => CommandResult::failure(
                "handle",
                "io",
                format!("failed to read request or write response: {error}"),
                8,
            ),
        }
    })
}

/// Reads one request (or one per line in `lines` mode), writes one envelope
/// per request followed by a newline. Returns how many requests were handled.
pub async fn process_input<R, W>(
    router: &ServiceRouter,
    mut reader: R,
    writer: &mut W,
    lines: bool,
    request_id: &str,
) -> io::Result<usize>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    if !lines {
        let mut payload = Vec::new();
        reader.read_to_end(&mut payload).await?;
        let response = handle_one(router, &payload, request_id).await;
        write_response(writer, &response).await?;
        return Ok(1);
    }

    let mut handled = 0;
    let mut line = Vec::new();
    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line).await? == 0 {
            break;
        }
        if line.iter().all(u8::is_ascii_whitespace) {
            continue;
        }
        handled += 1;
        let line_request_id = format!("{request_id}-{handled}");
        let response = handle_one(router, &line, &line_request_id).await;
        write_response(writer, &response).await?;
    }
    Ok(handled)
}

async fn handle_one(router: &ServiceRouter, payload: &[u8], request_id: &str) -> ActionResponse {
    match serde_json::from_slice::<ActionRequest>(payload) {
        Ok(request) => {
            let span = tracing::info_span!(
                "request",
                request_id = %request_id,
                action_group = %request.action_group,
                function = %request.function,
            );
            router.route(&request).instrument(span).await
        }
        Err(error) => {
            let span = tracing::info_span!("request", request_id = %request_id);
            span.in_scope(|| router.reject_malformed(&error))
        }
    }
}

async fn write_response<W: AsyncWrite + Unpin>(
    writer: &mut W,
    response: &ActionResponse,
) -> io::Result<()> {
    writer.write_all(response.to_json().as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await
}
