//! Command surface
//!
//! One module per resource; each declares its flag catalog, builds its clap
//! subtree from that catalog, and dispatches verbs through the three shared
//! templates below: single-record, `batch`, and `recursive`. The helpers in
//! this module are the only place the catalogs meet the CLI library.

use std::path::Path;
use std::sync::Arc;

use clap::{Arg, ArgAction, ArgMatches, Command};
use serde_json::Value;
use tracing::info;

use crate::batch::{self, BatchConfig, BatchOp, ResultSink};
use crate::bind;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::fileutil::FileSource;
use crate::flags::{Catalog, FlagKind, Verb};
use crate::output::{self, OutputConfig, StreamEncoder};
use crate::recurse::{self, DirectoryLister};
use crate::rest::RestClient;
use crate::retry::{Retrier, RetryConfig};

pub mod calendarlist;
pub mod delegates;
pub mod groups;
pub mod members;
pub mod orgunits;
pub mod permissions;
pub mod schemas;
pub mod sendas;
pub mod userphotos;
pub mod users;

/// Everything a verb handler needs, injected at dispatch time
pub struct Context {
    pub rest: Arc<RestClient>,
    pub lister: Arc<dyn DirectoryLister>,
    pub files: Arc<dyn FileSource>,
    pub output: OutputConfig,
    pub config: Config,
    /// Worker count resolved from the top-level `--threads` flag
    pub threads: usize,
}

/// All resource command trees, in registration order
pub fn resource_commands() -> Vec<Command> {
    vec![
        users::command(),
        groups::command(),
        members::command(),
        orgunits::command(),
        schemas::command(),
        calendarlist::command(),
        delegates::command(),
        sendas::command(),
        permissions::command(),
        userphotos::command(),
    ]
}

/// Every registered catalog; the invariant suite walks this list
pub fn all_catalogs() -> Vec<&'static Catalog> {
    vec![
        &users::CATALOG,
        &groups::CATALOG,
        &members::CATALOG,
        &orgunits::CATALOG,
        &schemas::CATALOG,
        &calendarlist::CATALOG,
        &delegates::CATALOG,
        &sendas::CATALOG,
        &permissions::CATALOG,
        &userphotos::CATALOG,
    ]
}

/// Dispatches a parsed resource subcommand
pub async fn dispatch(ctx: &Context, resource: &str, matches: &ArgMatches) -> Result<()> {
    match resource {
        "users" => users::run(ctx, matches).await,
        "groups" => groups::run(ctx, matches).await,
        "members" => members::run(ctx, matches).await,
        "orgunits" => orgunits::run(ctx, matches).await,
        "schemas" => schemas::run(ctx, matches).await,
        "calendarlist" => calendarlist::run(ctx, matches).await,
        "delegates" => delegates::run(ctx, matches).await,
        "sendas" => sendas::run(ctx, matches).await,
        "permissions" => permissions::run(ctx, matches).await,
        "userphotos" => userphotos::run(ctx, matches).await,
        other => Err(Error::InvalidInvocation(format!(
            "unknown resource {:?}",
            other
        ))),
    }
}

/// Builds a resource's command tree from its catalog
///
/// Each verb gets every available flag registered (required ones marked so),
/// a `batch` child with the common batch flags, and, when the catalog marks
/// any flag recursive for the verb, a `recursive` child.
pub fn resource_command(
    name: &'static str,
    about: &'static str,
    catalog: &'static Catalog,
    verbs: &[Verb],
) -> Command {
    let mut cmd = Command::new(name)
        .about(about)
        .subcommand_required(true)
        .arg_required_else_help(true);

    for &verb in verbs {
        // Required flags bind the single-record invocation only; batch and
        // recursive children source them from the CSV or the expansion.
        let mut verb_cmd = register_flags(Command::new(verb.name()), catalog, verb)
            .subcommand_negates_reqs(true);
        verb_cmd = verb_cmd.subcommand(batch_subcommand());
        if !catalog.recursive_flags(verb).is_empty() {
            verb_cmd = verb_cmd.subcommand(recursive_subcommand(catalog, verb));
        }
        cmd = cmd.subcommand(verb_cmd);
    }
    cmd
}

/// Registers every catalog flag available for the verb on a clap command
///
/// Flags are plain string-valued arguments (repeatable for list kinds); the
/// binder owns coercion and defaults so that explicit-set tracking stays
/// exact. Required flags are enforced by clap on the single-record path and
/// re-checked by the binder for CSV rows.
pub fn register_flags(mut cmd: Command, catalog: &'static Catalog, verb: Verb) -> Command {
    for flag in catalog.available_for(verb) {
        let mut arg = Arg::new(flag.id)
            .long(flag.id)
            .value_name(flag.kind.name())
            .action(match flag.kind {
                FlagKind::StrList => ArgAction::Append,
                _ => ArgAction::Set,
            });
        if flag.required_for(verb) {
            arg = arg.required(true);
        }
        cmd = cmd.arg(arg);
    }
    cmd
}

fn batch_subcommand() -> Command {
    Command::new("batch")
        .about("Apply this operation to every row of a CSV file")
        .arg(
            Arg::new("path")
                .long("path")
                .value_name("file.csv")
                .required(true),
        )
        .arg(
            Arg::new("delimiter")
                .long("delimiter")
                .value_name("char")
                .default_value(","),
        )
}

fn recursive_subcommand(catalog: &'static Catalog, verb: Verb) -> Command {
    let mut cmd = Command::new("recursive")
        .about("Apply this operation to every user under the given org units and groups")
        .arg(
            Arg::new("orgUnit")
                .long("orgUnit")
                .value_name("path")
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new("groupEmail")
                .long("groupEmail")
                .value_name("email")
                .action(ArgAction::Append),
        );

    for flag in catalog.recursive_flags(verb) {
        let arg = Arg::new(flag.id)
            .long(flag.id)
            .value_name(flag.kind.name())
            .action(match flag.kind {
                FlagKind::StrList => ArgAction::Append,
                _ => ArgAction::Set,
            });
        cmd = cmd.arg(arg);
    }
    cmd
}

/// Verb dispatch shared by every resource module
///
/// Parses the verb, asks the module for its operation, and routes to the
/// single-record, batch, or recursive template. `user_flag` names the flag
/// recursive mode binds per expanded user.
pub async fn run_resource<F>(
    ctx: &Context,
    matches: &ArgMatches,
    catalog: &'static Catalog,
    user_flag: &'static str,
    make_op: F,
) -> Result<()>
where
    F: Fn(&Context, Verb) -> BatchOp,
{
    let (verb_name, verb_matches) = matches
        .subcommand()
        .ok_or_else(|| Error::InvalidInvocation("missing verb".to_string()))?;
    let verb = Verb::parse(verb_name).ok_or_else(|| {
        Error::InvalidInvocation(format!("unknown verb {:?}", verb_name))
    })?;
    let op = make_op(ctx, verb);

    match verb_matches.subcommand() {
        Some(("batch", sub)) => {
            run_batch(ctx, catalog, verb, sub, op).await?;
            Ok(())
        }
        Some(("recursive", sub)) => {
            run_recursive(ctx, catalog, verb, sub, user_flag, op).await?;
            Ok(())
        }
        _ => run_single(ctx, catalog, verb, verb_matches, op).await,
    }
}

/// Single-record template: bind → assemble/call → format
pub async fn run_single(
    ctx: &Context,
    catalog: &'static Catalog,
    verb: Verb,
    matches: &ArgMatches,
    op: BatchOp,
) -> Result<()> {
    let values = bind::bind_cli(catalog, verb, matches)?;
    let context = bind::context_key(catalog, verb, &values);
    let retry = RetryConfig::default();
    let record = Retrier::new(&retry, &context)
        .run(|| op(values.clone()))
        .await?;
    output::write_value(&ctx.output, &record)
}

/// Batch template: CSV pipeline per the executor's topology
pub async fn run_batch(
    ctx: &Context,
    catalog: &'static Catalog,
    verb: Verb,
    sub: &ArgMatches,
    op: BatchOp,
) -> Result<usize> {
    let path = sub
        .get_one::<String>("path")
        .ok_or_else(|| Error::InvalidInvocation("--path is required".to_string()))?;
    let delimiter = parse_delimiter(sub.get_one::<String>("delimiter"))?;
    let threads = resolve_threads(ctx, sub)?;

    info!(
        "batch {} {} from {} with {} worker(s)",
        catalog.resource,
        verb.name(),
        path,
        threads
    );

    batch::run_csv_batch(
        Path::new(path),
        delimiter,
        catalog,
        verb,
        batch_config(ctx, threads),
        op,
        make_sink(&ctx.output),
    )
    .await
}

/// Recursive template: expand org units and groups, then run the pool
pub async fn run_recursive(
    ctx: &Context,
    catalog: &'static Catalog,
    verb: Verb,
    sub: &ArgMatches,
    user_flag: &'static str,
    op: BatchOp,
) -> Result<usize> {
    let org_units = string_values(sub, "orgUnit");
    let groups = string_values(sub, "groupEmail");
    if org_units.is_empty() && groups.is_empty() {
        return Err(Error::InvalidInvocation(
            "recursive mode needs at least one --orgUnit or --groupEmail".to_string(),
        ));
    }
    let threads = resolve_threads(ctx, sub)?;
    let base = bind::bind_recursive(catalog, verb, user_flag, sub)?;

    info!(
        "recursive {} {} over {} org unit(s) and {} group(s) with {} worker(s)",
        catalog.resource,
        verb.name(),
        org_units.len(),
        groups.len(),
        threads
    );

    let (users, errors) = recurse::expand(Arc::clone(&ctx.lister), org_units, groups, threads);
    let units = recurse::units_from_users(users, base, user_flag, threads);
    let error_drain = tokio::spawn(recurse::drain_errors(errors));

    let count = batch::run_units(units, batch_config(ctx, threads), op, make_sink(&ctx.output))
        .await?;

    if let Ok(failures) = error_drain.await {
        if failures > 0 {
            info!("expansion reported {} failure(s)", failures);
        }
    }
    Ok(count)
}

fn batch_config(ctx: &Context, threads: usize) -> BatchConfig {
    BatchConfig {
        threads,
        pacing: ctx.config.standard_delay,
        retry: RetryConfig::default(),
    }
}

fn make_sink(output: &OutputConfig) -> ResultSink {
    if output.stream {
        ResultSink::Streaming(Arc::new(StreamEncoder::stdout(*output)))
    } else {
        ResultSink::Buffered(*output)
    }
}

fn resolve_threads(ctx: &Context, sub: &ArgMatches) -> Result<usize> {
    match sub.get_one::<String>("threads") {
        Some(raw) => {
            let n: usize = raw.parse().map_err(|_| {
                Error::InvalidInvocation(format!("--threads {:?} is not a number", raw))
            })?;
            Ok(ctx.config.clamp_threads(Some(n)))
        }
        None => Ok(ctx.threads),
    }
}

fn string_values(matches: &ArgMatches, id: &str) -> Vec<String> {
    matches
        .get_many::<String>(id)
        .map(|vals| vals.cloned().collect())
        .unwrap_or_default()
}

fn parse_delimiter(raw: Option<&String>) -> Result<u8> {
    let raw = raw.map(|s| s.as_str()).unwrap_or(",");
    let mut bytes = raw.bytes();
    match (bytes.next(), bytes.next()) {
        (Some(b), None) => Ok(b),
        _ => Err(Error::InvalidInvocation(format!(
            "--delimiter must be a single byte, got {:?}",
            raw
        ))),
    }
}

/// Composite record for delete-style verbs
pub fn delete_record(fields: &[(&str, &str)]) -> Value {
    let mut map = serde_json::Map::new();
    for (k, v) in fields {
        map.insert(k.to_string(), Value::String(v.to_string()));
    }
    map.insert("success".to_string(), Value::Bool(true));
    Value::Object(map)
}

/// Pulls a required string flag out of a bound value map
///
/// The binder has already enforced presence for required flags; this guards
/// the handler against a catalog/handler mismatch all the same.
pub fn require_str(values: &bind::ValueMap, id: &str) -> Result<String> {
    values
        .str_value(id)
        .map(str::to_string)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| Error::InvalidInvocation(format!("flag --{} must be set", id)))
}
