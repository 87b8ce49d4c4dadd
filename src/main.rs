//! Binary entry point for the `nubes-lifecycle` CLI.

use std::io::{self, Write};
use std::process;

use clap::Parser;
use thiserror::Error;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use nubes_lifecycle::token::{TokenError, resolve_api_token};
use nubes_lifecycle::transport::TransportError;
use nubes_lifecycle::{
    Action, CancelSignal, ConfigError, CreateRequest, Engine, HttpTransport, InstanceUid,
    LifecycleError, NubesConfig, ParamId, ParamMap, RetireMode, ServiceId, cancel_pair,
};

mod cli;

use cli::{Cli, CreateCommand, DeleteCommand, FindCommand, InstanceArgs, ModifyCommand};

#[derive(Debug, Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("token error: {0}")]
    Token(#[from] TokenError),
    #[error("HTTP client error: {0}")]
    Client(#[from] TransportError),
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("no instance named `{name}` for service {service_id}")]
    NotFound { service_id: u32, name: String },
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();

    let (handle, cancel) = cancel_pair();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling");
            handle.cancel();
        }
    });

    let exit_code = match dispatch(cli, &cancel).await {
        Ok(code) => code,
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

async fn dispatch(cli: Cli, cancel: &CancelSignal) -> Result<i32, CliError> {
    match cli {
        Cli::Create(command) => exec_create(command, cancel).await,
        Cli::Modify(command) => exec_modify(command, cancel).await,
        Cli::Suspend(args) => exec_action(&args, Action::Suspend, cancel).await,
        Cli::Resume(args) => exec_action(&args, Action::Resume, cancel).await,
        Cli::Delete(command) => exec_delete(&command, cancel).await,
        Cli::Show(args) => exec_show(&args, cancel).await,
        Cli::Find(command) => exec_find(command, cancel).await,
    }
}

fn build_engine() -> Result<Engine<HttpTransport>, CliError> {
    let config = NubesConfig::load_without_cli_args()?;
    config.validate()?;
    let token = resolve_api_token(config.inline_token(), Some(config.token_file.as_str()))?;
    let transport = HttpTransport::new(&config.http_settings(token))?;
    Ok(Engine::configured(transport, &config))
}

fn param_map(pairs: Vec<(u32, String)>) -> ParamMap {
    pairs
        .into_iter()
        .map(|(id, value)| (ParamId(id), value))
        .collect()
}

fn instance_uid(raw: &str) -> Result<InstanceUid, CliError> {
    let uid = InstanceUid::new(raw);
    if uid.is_empty() {
        return Err(CliError::InvalidArgument(String::from(
            "instance identifier must not be empty",
        )));
    }
    Ok(uid)
}

fn print_line(line: &str) {
    writeln!(io::stdout(), "{line}").ok();
}

async fn exec_create(command: CreateCommand, cancel: &CancelSignal) -> Result<i32, CliError> {
    let request = CreateRequest {
        service_id: ServiceId(command.service_id),
        display_name: command.name,
        resume_if_exists: !command.no_resume,
        params: param_map(command.params),
    };
    let engine = build_engine()?;
    let outcome = engine.create_or_adopt(&request, cancel).await?;
    info!(outcome = outcome.label(), "create finished");
    print_line(outcome.instance_uid().as_str());
    Ok(0)
}

async fn exec_modify(command: ModifyCommand, cancel: &CancelSignal) -> Result<i32, CliError> {
    let uid = instance_uid(&command.instance)?;
    let engine = build_engine()?;
    engine
        .run_operation(&uid, Action::Modify, &param_map(command.params), cancel)
        .await?;
    Ok(0)
}

async fn exec_action(
    args: &InstanceArgs,
    action: Action,
    cancel: &CancelSignal,
) -> Result<i32, CliError> {
    let uid = instance_uid(&args.instance)?;
    let engine = build_engine()?;
    engine
        .run_operation(&uid, action, &ParamMap::new(), cancel)
        .await?;
    Ok(0)
}

async fn exec_delete(command: &DeleteCommand, cancel: &CancelSignal) -> Result<i32, CliError> {
    let mode: RetireMode = command
        .mode
        .parse()
        .map_err(|err| CliError::InvalidArgument(format!("{err}")))?;
    let uid = instance_uid(&command.instance)?;
    let engine = build_engine()?;
    engine.retire(&uid, mode, cancel).await?;
    Ok(0)
}

async fn exec_show(args: &InstanceArgs, cancel: &CancelSignal) -> Result<i32, CliError> {
    let uid = instance_uid(&args.instance)?;
    let engine = build_engine()?;
    let state = engine.instance_state(&uid, cancel).await?;
    print_line(&format!(
        "{}\t{}\t{:?}\t{}",
        state.instance_uid,
        state.explained_status,
        state.readiness(),
        state.action_names().join(",")
    ));
    Ok(0)
}

async fn exec_find(command: FindCommand, cancel: &CancelSignal) -> Result<i32, CliError> {
    let engine = build_engine()?;
    let found = engine
        .find_instance(ServiceId(command.service_id), &command.name, cancel)
        .await?;
    let state = found.ok_or(CliError::NotFound {
        service_id: command.service_id,
        name: command.name,
    })?;
    print_line(state.instance_uid.as_str());
    Ok(0)
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
    use rstest::rstest;

    #[rstest]
    #[case("198=small", 198, "small")]
    #[case("12=", 12, "")]
    #[case(" 7 =a=b", 7, "a=b")]
    fn parse_param_accepts_pairs(#[case] raw: &str, #[case] id: u32, #[case] value: &str) {
        let parsed = cli::parse_param(raw).unwrap_or_else(|err| panic!("parse {raw}: {err}"));
        assert_eq!(parsed, (id, value.to_owned()));
    }

    #[rstest]
    #[case("novalue")]
    #[case("abc=1")]
    #[case("0=x")]
    #[case("-3=x")]
    fn parse_param_rejects_malformed_pairs(#[case] raw: &str) {
        assert!(cli::parse_param(raw).is_err(), "{raw} should be rejected");
    }

    #[test]
    fn param_map_orders_by_id() {
        let map = param_map(vec![(9, String::from("b")), (3, String::from("a"))]);
        let ids: Vec<u32> = map.keys().map(|id| id.get()).collect();
        assert_eq!(ids, vec![3, 9]);
    }

    #[test]
    fn blank_instance_uid_is_rejected() {
        let err = instance_uid("   ").expect_err("blank uid");
        assert!(matches!(err, CliError::InvalidArgument(_)));
    }

    #[test]
    fn write_error_renders_lifecycle_errors() {
        let mut buf = Vec::new();
        let err = CliError::Lifecycle(LifecycleError::Api {
            status: 404,
            body: String::from("not found"),
        });
        write_error(&mut buf, &err);
        let rendered = String::from_utf8(buf).expect("utf8");
        assert_eq!(rendered, "API error 404: not found\n");
    }
}
