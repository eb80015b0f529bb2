//! Binary entry point for the SoftLayer CPI.
//!
//! Reads one director request from stdin, runs it, and writes the response to
//! stdout. Logs go to stderr so stdout carries nothing but the response.

use std::io::{self, Read, Write};
use std::process;

use clap::Parser;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

use softlayer_cpi::config::ConfigError;
use softlayer_cpi::{Dispatcher, Request, Response, SoftLayerConfig};

mod cli;

use cli::Cli;

#[derive(Debug, Error)]
enum CliError {
    #[error("failed to read request: {0}")]
    Input(String),
    #[error("invalid request: {0}")]
    Request(String),
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("failed to write response: {0}")]
    Output(String),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing();
    let exit_code = match run(&cli).await {
        Ok(()) => 0,
        Err(err) => {
            report_error(&err);
            1
        }
    };

    process::exit(exit_code);
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

async fn run(cli: &Cli) -> Result<(), CliError> {
    let request = read_request(io::stdin())?;

    let config = SoftLayerConfig::load_without_cli_args()?;
    config.validate()?;
    let agent_options = config.load_agent_options(cli.agent_options.as_deref())?;

    let dispatcher = Dispatcher::new(
        config.client(),
        config.hosts(),
        agent_options,
        config.creator_waits(),
    );
    let response = dispatcher.dispatch(&request).await;
    write_response(io::stdout(), &response)
}

fn read_request(mut source: impl Read) -> Result<Request, CliError> {
    let mut raw = String::new();
    source
        .read_to_string(&mut raw)
        .map_err(|err| CliError::Input(err.to_string()))?;
    serde_json::from_str(&raw).map_err(|err| CliError::Request(err.to_string()))
}

fn write_response(mut target: impl Write, response: &Response) -> Result<(), CliError> {
    let encoded =
        serde_json::to_string(response).map_err(|err| CliError::Output(err.to_string()))?;
    writeln!(target, "{encoded}").map_err(|err| CliError::Output(err.to_string()))
}

fn report_error(err: &CliError) {
    write_error(io::stderr(), err);
}

fn write_error(mut target: impl Write, err: &CliError) {
    writeln!(target, "{err}").ok();
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Cursor;

    #[test]
    fn read_request_parses_director_payload() {
        let payload = r#"{"method":"has_vm","arguments":["1234"],"context":{"director_uuid":"abc"}}"#;
        let request = read_request(Cursor::new(payload))
            .unwrap_or_else(|err| panic!("request should parse: {err}"));
        assert_eq!(request.method, "has_vm");
        assert_eq!(request.arguments, vec![json!("1234")]);
        assert_eq!(request.context.get("director_uuid"), Some(&json!("abc")));
    }

    #[test]
    fn read_request_rejects_malformed_json() {
        let result = read_request(Cursor::new("{not json"));
        assert!(
            matches!(result, Err(CliError::Request(_))),
            "expected Request error, got {result:?}"
        );
    }

    #[test]
    fn write_response_emits_one_json_line() {
        let mut buf = Vec::new();
        write_response(&mut buf, &Response::success(json!(true)))
            .unwrap_or_else(|err| panic!("write response: {err}"));
        let rendered = String::from_utf8(buf).unwrap_or_else(|err| panic!("utf8: {err}"));
        assert_eq!(rendered, "{\"result\":true,\"error\":null,\"log\":\"\"}\n");
    }

    #[test]
    fn write_error_writes_cli_error() {
        let mut buf = Vec::new();
        write_error(&mut buf, &CliError::Request(String::from("EOF")));
        let rendered = String::from_utf8(buf).unwrap_or_else(|err| panic!("utf8: {err}"));
        assert!(
            rendered.contains("invalid request: EOF"),
            "rendered: {rendered}"
        );
    }
}
