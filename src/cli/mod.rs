//! Command-line interface definitions for the `nubes-lifecycle` binary.
//!
//! This module centralises the clap parser structures so both the main binary
//! and the build script can reuse them when generating the manual page. It
//! must not depend on the library crate.

use clap::{Args, Parser};

/// Top-level CLI for the `nubes-lifecycle` binary.
#[derive(Debug, Parser)]
#[command(
    name = "nubes-lifecycle",
    about = "Create, modify, suspend, resume and delete Nubes cloud instances",
    arg_required_else_help = true
)]
pub(crate) enum Cli {
    /// Create an instance, or adopt an existing one with the same name.
    #[command(name = "create")]
    Create(CreateCommand),
    /// Reconfigure an instance.
    #[command(name = "modify")]
    Modify(ModifyCommand),
    /// Suspend an instance.
    #[command(name = "suspend")]
    Suspend(InstanceArgs),
    /// Resume a suspended instance.
    #[command(name = "resume")]
    Resume(InstanceArgs),
    /// Retire an instance according to a retire mode.
    #[command(name = "delete")]
    Delete(DeleteCommand),
    /// Print the current state of an instance.
    #[command(name = "show")]
    Show(InstanceArgs),
    /// Look up an instance by service id and display name.
    #[command(name = "find")]
    Find(FindCommand),
}

/// Arguments for `nubes-lifecycle create`.
#[derive(Debug, Args)]
pub(crate) struct CreateCommand {
    /// Service catalogue identifier selecting the resource kind.
    #[arg(long, value_name = "ID")]
    pub(crate) service_id: u32,
    /// Display name of the instance; also used to find an existing one.
    #[arg(long, value_name = "NAME")]
    pub(crate) name: String,
    /// Parameter value as `ID=VALUE`; repeat for several parameters.
    #[arg(long = "param", value_name = "ID=VALUE", value_parser = parse_param)]
    pub(crate) params: Vec<(u32, String)>,
    /// Fail instead of adopting an existing instance with the same name.
    #[arg(long)]
    pub(crate) no_resume: bool,
}

/// Arguments for `nubes-lifecycle modify`.
#[derive(Debug, Args)]
pub(crate) struct ModifyCommand {
    /// Instance identifier.
    #[arg(long, value_name = "UID")]
    pub(crate) instance: String,
    /// Parameter value as `ID=VALUE`; repeat for several parameters.
    #[arg(long = "param", value_name = "ID=VALUE", value_parser = parse_param)]
    pub(crate) params: Vec<(u32, String)>,
}

/// Arguments naming a single instance.
#[derive(Debug, Args)]
pub(crate) struct InstanceArgs {
    /// Instance identifier.
    #[arg(long, value_name = "UID")]
    pub(crate) instance: String,
}

/// Arguments for `nubes-lifecycle delete`.
#[derive(Debug, Args)]
pub(crate) struct DeleteCommand {
    /// Instance identifier.
    #[arg(long, value_name = "UID")]
    pub(crate) instance: String,
    /// Retire mode: `state_only` leaves the instance running, `suspend` stops
    /// it, `delete` removes it.
    #[arg(long, value_name = "MODE", default_value = "delete")]
    pub(crate) mode: String,
}

/// Arguments for `nubes-lifecycle find`.
#[derive(Debug, Args)]
pub(crate) struct FindCommand {
    /// Service catalogue identifier.
    #[arg(long, value_name = "ID")]
    pub(crate) service_id: u32,
    /// Exact display name.
    #[arg(long, value_name = "NAME")]
    pub(crate) name: String,
}

/// Parses an `ID=VALUE` pair where `ID` is a positive integer. The value may
/// be empty and may itself contain `=`.
pub(crate) fn parse_param(raw: &str) -> Result<(u32, String), String> {
    let (id, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected ID=VALUE, got `{raw}`"))?;
    let parsed: u32 = id
        .trim()
        .parse()
        .map_err(|err| format!("invalid parameter id `{id}`: {err}"))?;
    if parsed == 0 {
        return Err(format!("parameter id must be positive, got `{id}`"));
    }
    Ok((parsed, value.to_owned()))
}
