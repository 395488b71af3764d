//! Gmail send-as aliases
//!
//! Carries the smtpMsa substructure with its security-mode enumeration and
//! the optional S/MIME upload, which is a second call against the alias's
//! smimeInfo collection with the PKCS#12 blob base64-encoded.

use std::path::Path;
use std::sync::Arc;

use clap::{ArgMatches, Command};
use futures::FutureExt;
use serde_json::Value;

use super::{delete_record, require_str, resource_command, run_resource, Context};
use crate::assemble::{check_enum, Payload};
use crate::batch::BatchOp;
use crate::bind::ValueMap;
use crate::error::{Error, Result};
use crate::fileutil::{read_base64_urlsafe, FileSource};
use crate::flags::{
    Catalog, DefaultValue, FlagDescriptor, FlagKind, Verb, NO_DEFAULTS, NO_VERBS,
};
use crate::rest::RestClient;

const SECURITY_MODES: &[&str] = &["none", "ssl", "starttls"];

static FLAGS: &[FlagDescriptor] = &[
    FlagDescriptor {
        id: "userId",
        kind: FlagKind::Str,
        available: &[Verb::All],
        required: NO_VERBS,
        excluded_from_all: NO_VERBS,
        defaults: &[
            (Verb::Get, DefaultValue::Str("me")),
            (Verb::List, DefaultValue::Str("me")),
            (Verb::Insert, DefaultValue::Str("me")),
            (Verb::Patch, DefaultValue::Str("me")),
            (Verb::Delete, DefaultValue::Str("me")),
        ],
        recursive: NO_VERBS,
    },
    FlagDescriptor {
        id: "sendAsEmail",
        kind: FlagKind::Str,
        available: &[Verb::Get, Verb::Insert, Verb::Patch, Verb::Delete],
        required: &[Verb::Get, Verb::Insert, Verb::Patch, Verb::Delete],
        excluded_from_all: NO_VERBS,
        defaults: NO_DEFAULTS,
        recursive: &[Verb::Insert, Verb::Patch, Verb::Delete],
    },
    FlagDescriptor {
        id: "displayName",
        kind: FlagKind::Str,
        available: &[Verb::Insert, Verb::Patch],
        required: NO_VERBS,
        excluded_from_all: NO_VERBS,
        defaults: NO_DEFAULTS,
        recursive: &[Verb::Insert, Verb::Patch],
    },
    FlagDescriptor {
        id: "replyToAddress",
        kind: FlagKind::Str,
        available: &[Verb::Insert, Verb::Patch],
        required: NO_VERBS,
        excluded_from_all: NO_VERBS,
        defaults: NO_DEFAULTS,
        recursive: &[Verb::Insert, Verb::Patch],
    },
    FlagDescriptor {
        id: "signature",
        kind: FlagKind::Str,
        available: &[Verb::Insert, Verb::Patch],
        required: NO_VERBS,
        excluded_from_all: NO_VERBS,
        defaults: NO_DEFAULTS,
        recursive: &[Verb::Insert, Verb::Patch],
    },
    FlagDescriptor {
        id: "isPrimary",
        kind: FlagKind::Bool,
        available: &[Verb::Patch],
        required: NO_VERBS,
        excluded_from_all: NO_VERBS,
        defaults: NO_DEFAULTS,
        recursive: NO_VERBS,
    },
    FlagDescriptor {
        id: "treatAsAlias",
        kind: FlagKind::Bool,
        available: &[Verb::Insert, Verb::Patch],
        required: NO_VERBS,
        excluded_from_all: NO_VERBS,
        defaults: NO_DEFAULTS,
        recursive: &[Verb::Insert, Verb::Patch],
    },
    FlagDescriptor {
        id: "smtpMsaHost",
        kind: FlagKind::Str,
        available: &[Verb::Insert, Verb::Patch],
        required: NO_VERBS,
        excluded_from_all: NO_VERBS,
        defaults: NO_DEFAULTS,
        recursive: NO_VERBS,
    },
    FlagDescriptor {
        id: "smtpMsaPort",
        kind: FlagKind::Int,
        available: &[Verb::Insert, Verb::Patch],
        required: NO_VERBS,
        excluded_from_all: NO_VERBS,
        defaults: NO_DEFAULTS,
        recursive: NO_VERBS,
    },
    FlagDescriptor {
        id: "smtpMsaUsername",
        kind: FlagKind::Str,
        available: &[Verb::Insert, Verb::Patch],
        required: NO_VERBS,
        excluded_from_all: NO_VERBS,
        defaults: NO_DEFAULTS,
        recursive: NO_VERBS,
    },
    FlagDescriptor {
        id: "smtpMsaPassword",
        kind: FlagKind::Str,
        available: &[Verb::Insert, Verb::Patch],
        required: NO_VERBS,
        excluded_from_all: &[Verb::Insert, Verb::Patch],
        defaults: NO_DEFAULTS,
        recursive: NO_VERBS,
    },
    FlagDescriptor {
        id: "smtpMsaSecurityMode",
        kind: FlagKind::Str,
        available: &[Verb::Insert, Verb::Patch],
        required: NO_VERBS,
        excluded_from_all: NO_VERBS,
        defaults: NO_DEFAULTS,
        recursive: NO_VERBS,
    },
    FlagDescriptor {
        id: "smimeFile",
        kind: FlagKind::Str,
        available: &[Verb::Insert],
        required: NO_VERBS,
        excluded_from_all: NO_VERBS,
        defaults: NO_DEFAULTS,
        recursive: NO_VERBS,
    },
    FlagDescriptor {
        id: "smimePassword",
        kind: FlagKind::Str,
        available: &[Verb::Insert],
        required: NO_VERBS,
        excluded_from_all: NO_VERBS,
        defaults: NO_DEFAULTS,
        recursive: NO_VERBS,
    },
];

pub static CATALOG: Catalog = Catalog::new("sendas", FLAGS);

const VERBS: &[Verb] = &[Verb::Get, Verb::List, Verb::Insert, Verb::Patch, Verb::Delete];

pub fn command() -> Command {
    resource_command("sendas", "Gmail send-as aliases", &CATALOG, VERBS)
}

pub async fn run(ctx: &Context, matches: &ArgMatches) -> Result<()> {
    run_resource(ctx, matches, &CATALOG, "userId", operation).await
}

fn operation(ctx: &Context, verb: Verb) -> BatchOp {
    let rest = Arc::clone(&ctx.rest);
    let files = Arc::clone(&ctx.files);
    Arc::new(move |values: ValueMap| {
        let rest = Arc::clone(&rest);
        let files = Arc::clone(&files);
        async move { execute(rest, files, verb, values).await }.boxed()
    })
}

async fn execute(
    rest: Arc<RestClient>,
    files: Arc<dyn FileSource>,
    verb: Verb,
    values: ValueMap,
) -> Result<Value> {
    let user = values.str_value("userId").unwrap_or("me").to_string();
    let base = format!("{}/users/{}/settings/sendAs", rest.endpoints().gmail, user);

    match verb {
        Verb::Get => {
            let alias = require_str(&values, "sendAsEmail")?;
            rest.get(&format!("{}/{}", base, alias), &[]).await
        }
        Verb::List => rest.get(&base, &[]).await,
        Verb::Insert => {
            let alias = require_str(&values, "sendAsEmail")?;
            let mut body = build_sendas(&values)?;
            body.set_value("sendAsEmail", Value::String(alias.clone()));
            let created = rest.post(&base, &body.into_value()).await?;

            if let Some(path) = values.str_value("smimeFile") {
                upload_smime(&rest, &*files, &base, &alias, path, &values).await?;
            }
            Ok(created)
        }
        Verb::Patch => {
            let alias = require_str(&values, "sendAsEmail")?;
            let body = build_sendas(&values)?;
            rest.patch(&format!("{}/{}", base, alias), &body.into_value())
                .await
        }
        Verb::Delete => {
            let alias = require_str(&values, "sendAsEmail")?;
            rest.delete(&format!("{}/{}", base, alias)).await?;
            Ok(delete_record(&[
                ("userId", &user),
                ("sendAsEmail", &alias),
            ]))
        }
        _ => Err(Error::InvalidInvocation(format!(
            "verb {} not supported for sendas",
            verb.name()
        ))),
    }
}

/// Assembles the send-as body; the smtpMsa substructure exists only when one
/// of its leaves is bound, and its security mode must name a known mode
pub fn build_sendas(values: &ValueMap) -> Result<Payload> {
    let mut p = Payload::new();
    p.set("displayName", values, "displayName");
    p.set("replyToAddress", values, "replyToAddress");
    p.set("signature", values, "signature");
    p.set("isPrimary", values, "isPrimary");
    p.set("treatAsAlias", values, "treatAsAlias");

    let mut msa = Payload::new();
    msa.set("host", values, "smtpMsaHost");
    msa.set("port", values, "smtpMsaPort");
    msa.set("username", values, "smtpMsaUsername");
    msa.set("password", values, "smtpMsaPassword");
    if let Some(mode) = values.str_value("smtpMsaSecurityMode") {
        // An explicit empty mode clears the field; anything else must name a
        // known mode.
        if !mode.is_empty() {
            check_enum("smtpMsaSecurityMode", mode, SECURITY_MODES)?;
        }
        msa.set("securityMode", values, "smtpMsaSecurityMode");
    }
    if !msa.is_empty() {
        // A relay section without a host is unusable upstream.
        if values.str_value("smtpMsaHost").map_or(true, str::is_empty) {
            return Err(Error::InvalidInvocation(
                "smtpMsa settings require --smtpMsaHost".to_string(),
            ));
        }
        p.set_object("smtpMsa", msa);
    }
    Ok(p)
}

async fn upload_smime(
    rest: &RestClient,
    files: &dyn FileSource,
    base: &str,
    alias: &str,
    path: &str,
    values: &ValueMap,
) -> Result<Value> {
    let encoded = read_base64_urlsafe(files, Path::new(path))?;
    let mut body = Payload::new();
    body.set_value("pkcs12", Value::String(encoded));
    if let Some(password) = values.str_value("smimePassword") {
        if !password.is_empty() {
            body.set_value("encryptedKeyPassword", Value::String(password.to_string()));
        }
    }
    rest.post(&format!("{}/{}/smimeInfo", base, alias), &body.into_value())
        .await
}
