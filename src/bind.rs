//! Value binder
//!
//! Turns raw CLI arguments or one CSV row into a [`ValueMap`]: for every flag
//! the verb accepts, the value that applies plus whether the caller set it
//! explicitly. The binder is the sole writer of that distinction; everything
//! downstream (the payload assembler in particular) only reads it.
//!
//! Resolution per flag:
//! 1. caller supplied a value → that value, explicit
//! 2. catalog declares a per-verb default → the default, not explicit
//! 3. otherwise → absent from the map
//!
//! CSV binding pairs each data row positionally with the header row. A header
//! cell is a flag identifier, optionally suffixed with `!` to mark the column
//! as clearable: an empty cell in a clearable column binds the flag's zero
//! value explicitly (which the assembler later turns into a force-send
//! entry), while an empty cell in a plain column means "not set".

use std::collections::HashMap;

use clap::ArgMatches;
use csv::StringRecord;

use crate::error::{Error, Result};
use crate::flags::{Catalog, FlagDescriptor, FlagKind, FlagValue, Verb};

/// A bound value plus its provenance
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    pub value: FlagValue,
    /// True iff the caller supplied the value (even if it equals the default)
    pub explicit: bool,
}

/// Resolved values for a single verb invocation, keyed by flag identifier
#[derive(Debug, Clone, Default)]
pub struct ValueMap {
    inner: HashMap<&'static str, Resolved>,
}

impl ValueMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<&Resolved> {
        self.inner.get(id)
    }

    /// Whether the caller explicitly set the flag
    pub fn is_explicit(&self, id: &str) -> bool {
        self.inner.get(id).map(|r| r.explicit).unwrap_or(false)
    }

    pub fn str_value(&self, id: &str) -> Option<&str> {
        self.inner.get(id).and_then(|r| r.value.as_str())
    }

    pub fn bool_value(&self, id: &str) -> Option<bool> {
        self.inner.get(id).and_then(|r| r.value.as_bool())
    }

    pub fn list_value(&self, id: &str) -> Option<&[String]> {
        self.inner.get(id).and_then(|r| r.value.as_list())
    }

    /// Inserts or replaces a binding; used by the binder and by recursive
    /// mode when it injects the expanded user identifier
    pub fn set(&mut self, id: &'static str, value: FlagValue, explicit: bool) {
        self.inner.insert(id, Resolved { value, explicit });
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&&'static str, &Resolved)> {
        self.inner.iter()
    }
}

/// Binds parsed CLI arguments for one verb into a value map
///
/// Flags are registered on clap as plain string arguments (repeatable for
/// list kinds) with no clap-side defaults, so presence in the matches is an
/// exact record of what the operator typed. Catalog defaults are applied
/// here, marked non-explicit.
pub fn bind_cli(catalog: &Catalog, verb: Verb, matches: &ArgMatches) -> Result<ValueMap> {
    let mut map = ValueMap::new();

    for flag in catalog.available_for(verb) {
        let supplied: Option<Vec<&String>> = matches
            .try_get_many::<String>(flag.id)
            .ok()
            .flatten()
            .map(|vals| vals.collect());

        match supplied {
            Some(raws) if !raws.is_empty() => {
                let value = coerce_occurrences(flag, &raws)?;
                map.set(flag.id, value, true);
            }
            _ => {
                if let Some(default) = flag.default_for(verb) {
                    map.set(flag.id, default, false);
                }
            }
        }
    }

    check_required(catalog, verb, &map)?;
    Ok(map)
}

/// Binds CLI arguments for a recursive subcommand
///
/// Only flags marked recursive for the verb participate, and required flags
/// satisfied by the expansion itself (`user_flag`, injected per user) are not
/// demanded from the operator.
pub fn bind_recursive(
    catalog: &Catalog,
    verb: Verb,
    user_flag: &str,
    matches: &ArgMatches,
) -> Result<ValueMap> {
    let mut map = ValueMap::new();

    for flag in catalog.recursive_flags(verb) {
        let supplied: Option<Vec<&String>> = matches
            .try_get_many::<String>(flag.id)
            .ok()
            .flatten()
            .map(|vals| vals.collect());

        match supplied {
            Some(raws) if !raws.is_empty() => {
                let value = coerce_occurrences(flag, &raws)?;
                map.set(flag.id, value, true);
            }
            _ => {
                if let Some(default) = flag.default_for(verb) {
                    map.set(flag.id, default, false);
                }
            }
        }
    }

    for flag in catalog.required_for(verb) {
        if flag.id != user_flag && map.get(flag.id).is_none() {
            return Err(Error::InvalidInvocation(format!(
                "required flag --{} missing for {} {} recursive",
                flag.id,
                catalog.resource,
                verb.name()
            )));
        }
    }
    Ok(map)
}

/// One parsed header column
#[derive(Debug, Clone)]
pub struct HeaderCol {
    /// Resolved flag identifier; `None` for ignored (empty) columns
    pub flag: Option<&'static str>,
    /// Trailing `!` clearing marker was present
    pub clear: bool,
}

/// Header row of a batch CSV, mapped against a catalog and verb
#[derive(Debug, Clone)]
pub struct Header {
    pub cols: Vec<HeaderCol>,
}

/// Parses the first CSV row into a column → flag mapping
///
/// Unknown identifiers and flags the verb does not accept are a
/// header/verb mismatch and rejected up front, before any row is processed.
pub fn parse_header(catalog: &Catalog, verb: Verb, record: &StringRecord) -> Result<Header> {
    let mut cols = Vec::with_capacity(record.len());
    for cell in record.iter() {
        let cell = cell.trim();
        if cell.is_empty() {
            cols.push(HeaderCol { flag: None, clear: false });
            continue;
        }
        let (name, clear) = match cell.strip_suffix('!') {
            Some(base) => (base, true),
            None => (cell, false),
        };
        let flag = catalog.get(name).ok_or_else(|| {
            Error::InvalidInvocation(format!(
                "header column {:?} is not a flag of resource {}",
                name, catalog.resource
            ))
        })?;
        if !flag.available_for(verb) {
            return Err(Error::InvalidInvocation(format!(
                "header column {:?} is not available for verb {}",
                name,
                verb.name()
            )));
        }
        cols.push(HeaderCol { flag: Some(flag.id), clear });
    }
    Ok(Header { cols })
}

/// Binds one CSV data row against a parsed header
pub fn bind_csv_row(
    catalog: &Catalog,
    verb: Verb,
    header: &Header,
    record: &StringRecord,
) -> Result<ValueMap> {
    let mut map = ValueMap::new();

    for (idx, col) in header.cols.iter().enumerate() {
        let Some(id) = col.flag else { continue };
        // Short rows are tolerated; missing trailing cells read as empty.
        let cell = record.get(idx).unwrap_or("").trim();
        let flag = catalog
            .get(id)
            .expect("header validated against this catalog");

        if cell.is_empty() {
            if col.clear {
                map.set(flag.id, FlagValue::zero(flag.kind), true);
            }
            continue;
        }
        map.set(flag.id, coerce_cell(flag, cell)?, true);
    }

    // Defaults for columns the row did not bind.
    for flag in catalog.available_for(verb) {
        if map.get(flag.id).is_none() {
            if let Some(default) = flag.default_for(verb) {
                map.set(flag.id, default, false);
            }
        }
    }

    check_required(catalog, verb, &map)?;
    Ok(map)
}

/// Builds the operator-visible context key for one row
///
/// Joins the values of the verb's required flags in catalog order with
/// ` - ` and a trailing `:`, e.g. `alice@x - bob@x:`. Rows that failed
/// binding fall back to a row-number key at the call site.
pub fn context_key(catalog: &Catalog, verb: Verb, map: &ValueMap) -> String {
    let mut parts = Vec::new();
    for flag in catalog.required_for(verb) {
        if let Some(resolved) = map.get(flag.id) {
            match &resolved.value {
                FlagValue::Str(s) => parts.push(s.clone()),
                FlagValue::Bool(b) => parts.push(b.to_string()),
                FlagValue::Int(n) => parts.push(n.to_string()),
                FlagValue::Int64(n) => parts.push(n.to_string()),
                FlagValue::StrList(v) => parts.push(v.join(",")),
            }
        }
    }
    format!("{}:", parts.join(" - "))
}

/// Splits a `k1=v1;k2=v2` sub-flag string into ordered pairs
///
/// Empty sub-tokens are preserved as pairs with empty values so that callers
/// can clear sub-fields explicitly; a token without `=` is malformed.
pub fn parse_kv_pairs(raw: &str) -> Result<Vec<(String, String)>> {
    let mut pairs = Vec::new();
    for token in raw.split(';') {
        if token.is_empty() {
            continue;
        }
        match token.split_once('=') {
            Some((k, v)) => pairs.push((k.trim().to_string(), v.trim().to_string())),
            None => {
                return Err(Error::InvalidInvocation(format!(
                    "malformed sub-flag token {:?}; expected key=value",
                    token
                )))
            }
        }
    }
    Ok(pairs)
}

fn check_required(catalog: &Catalog, verb: Verb, map: &ValueMap) -> Result<()> {
    for flag in catalog.required_for(verb) {
        if map.get(flag.id).is_none() {
            return Err(Error::InvalidInvocation(format!(
                "required flag --{} missing for {} {}",
                flag.id,
                catalog.resource,
                verb.name()
            )));
        }
    }
    Ok(())
}

/// Coerces repeated CLI occurrences of one flag
///
/// List kinds accumulate occurrences; scalar kinds take the last occurrence,
/// matching how clap reports overridden flags.
fn coerce_occurrences(flag: &FlagDescriptor, raws: &[&String]) -> Result<FlagValue> {
    match flag.kind {
        FlagKind::StrList => {
            let mut items = Vec::new();
            for raw in raws {
                split_list_into(raw, &mut items);
            }
            Ok(FlagValue::StrList(items))
        }
        _ => {
            let raw = raws.last().expect("non-empty occurrence list");
            coerce_scalar(flag, raw)
        }
    }
}

/// Coerces a single CSV cell
fn coerce_cell(flag: &FlagDescriptor, cell: &str) -> Result<FlagValue> {
    match flag.kind {
        FlagKind::StrList => {
            let mut items = Vec::new();
            split_list_into(cell, &mut items);
            Ok(FlagValue::StrList(items))
        }
        _ => coerce_scalar(flag, cell),
    }
}

fn coerce_scalar(flag: &FlagDescriptor, raw: &str) -> Result<FlagValue> {
    match flag.kind {
        FlagKind::Str => Ok(FlagValue::Str(raw.to_string())),
        FlagKind::Bool => match raw.to_ascii_lowercase().as_str() {
            "true" | "yes" | "on" => Ok(FlagValue::Bool(true)),
            "false" | "no" | "off" => Ok(FlagValue::Bool(false)),
            _ => Err(Error::bad_value(flag.id, raw, "bool")),
        },
        FlagKind::Int => raw
            .parse::<i32>()
            .map(FlagValue::Int)
            .map_err(|_| Error::bad_value(flag.id, raw, "int")),
        FlagKind::Int64 => raw
            .parse::<i64>()
            .map(FlagValue::Int64)
            .map_err(|_| Error::bad_value(flag.id, raw, "int64")),
        FlagKind::StrList => unreachable!("handled by caller"),
    }
}

/// Splits a `;`-delimited list cell, preserving interior empty sub-tokens
///
/// A wholly empty input contributes nothing; `a;;b` contributes three items
/// with an empty middle so list positions stay addressable.
fn split_list_into(raw: &str, out: &mut Vec<String>) {
    if raw.is_empty() {
        return;
    }
    for token in raw.split(';') {
        out.push(token.trim().to_string());
    }
}
