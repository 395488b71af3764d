//! Declarative flag catalog
//!
//! Every resource describes its options as a static table of
//! [`FlagDescriptor`] entries. The descriptors are rich enough that the
//! binder, assembler, batch executor, and command registration all run
//! without resource-specific code: each knows only the catalog and the verb.
//!
//! Availability is expressed either by naming verbs directly or with the
//! [`Verb::All`] wildcard, which marks a flag available for every verb of the
//! resource. `excluded_from_all` does not remove availability: it keeps an
//! available flag out of the catch-all "every applicable flag" expansion that
//! `wildcard_expansion` reports, which is how sensitive fields like passwords
//! stay settable but are never auto-included.
//!
//! Catalogs are process-lifetime immutable singletons; nothing mutates a
//! descriptor after startup.

use crate::error::{Error, Result};

/// A single operation on a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    Get,
    List,
    Insert,
    Update,
    Patch,
    Delete,
    /// Wildcard marker in availability sets; never a real verb
    All,
}

impl Verb {
    /// CLI-facing name of the verb
    pub fn name(&self) -> &'static str {
        match self {
            Verb::Get => "get",
            Verb::List => "list",
            Verb::Insert => "insert",
            Verb::Update => "update",
            Verb::Patch => "patch",
            Verb::Delete => "delete",
            Verb::All => "all",
        }
    }

    pub fn parse(s: &str) -> Option<Verb> {
        match s {
            "get" => Some(Verb::Get),
            "list" => Some(Verb::List),
            "insert" | "create" => Some(Verb::Insert),
            "update" => Some(Verb::Update),
            "patch" => Some(Verb::Patch),
            "delete" => Some(Verb::Delete),
            _ => None,
        }
    }
}

/// Value kind of an option
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagKind {
    Str,
    Bool,
    Int,
    Int64,
    StrList,
}

impl FlagKind {
    pub fn name(&self) -> &'static str {
        match self {
            FlagKind::Str => "string",
            FlagKind::Bool => "bool",
            FlagKind::Int => "int",
            FlagKind::Int64 => "int64",
            FlagKind::StrList => "string list",
        }
    }
}

/// A runtime flag value
#[derive(Debug, Clone, PartialEq)]
pub enum FlagValue {
    Str(String),
    Bool(bool),
    Int(i32),
    Int64(i64),
    StrList(Vec<String>),
}

impl FlagValue {
    /// The zero value for a kind; what an explicit clear resolves to
    pub fn zero(kind: FlagKind) -> FlagValue {
        match kind {
            FlagKind::Str => FlagValue::Str(String::new()),
            FlagKind::Bool => FlagValue::Bool(false),
            FlagKind::Int => FlagValue::Int(0),
            FlagKind::Int64 => FlagValue::Int64(0),
            FlagKind::StrList => FlagValue::StrList(Vec::new()),
        }
    }

    /// Whether this value equals the zero value for its kind
    pub fn is_zero(&self) -> bool {
        match self {
            FlagValue::Str(s) => s.is_empty(),
            FlagValue::Bool(b) => !b,
            FlagValue::Int(n) => *n == 0,
            FlagValue::Int64(n) => *n == 0,
            FlagValue::StrList(v) => v.is_empty(),
        }
    }

    pub fn kind(&self) -> FlagKind {
        match self {
            FlagValue::Str(_) => FlagKind::Str,
            FlagValue::Bool(_) => FlagKind::Bool,
            FlagValue::Int(_) => FlagKind::Int,
            FlagValue::Int64(_) => FlagKind::Int64,
            FlagValue::StrList(_) => FlagKind::StrList,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FlagValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FlagValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            FlagValue::StrList(v) => Some(v),
            _ => None,
        }
    }
}

/// Const-friendly default value carried in descriptor tables
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DefaultValue {
    Str(&'static str),
    Bool(bool),
    Int(i32),
    Int64(i64),
}

impl DefaultValue {
    pub fn to_value(self) -> FlagValue {
        match self {
            DefaultValue::Str(s) => FlagValue::Str(s.to_string()),
            DefaultValue::Bool(b) => FlagValue::Bool(b),
            DefaultValue::Int(n) => FlagValue::Int(n),
            DefaultValue::Int64(n) => FlagValue::Int64(n),
        }
    }
}

/// Declarative description of one option
#[derive(Debug)]
pub struct FlagDescriptor {
    /// Identifier; doubles as the long CLI flag and the CSV header cell
    pub id: &'static str,
    pub kind: FlagKind,
    /// Verbs this flag is available for; may contain [`Verb::All`]
    pub available: &'static [Verb],
    /// Verbs that reject an invocation without this flag
    pub required: &'static [Verb],
    /// Verbs whose wildcard-all expansion skips this flag
    pub excluded_from_all: &'static [Verb],
    /// Per-verb defaults applied when the caller does not set the flag
    pub defaults: &'static [(Verb, DefaultValue)],
    /// Verbs for which this flag may be bound in recursive mode
    pub recursive: &'static [Verb],
}

impl FlagDescriptor {
    fn wildcard(&self) -> bool {
        self.available.contains(&Verb::All)
    }

    /// Whether the flag is available for a concrete verb
    pub fn available_for(&self, verb: Verb) -> bool {
        self.wildcard() || self.available.contains(&verb)
    }

    /// Whether the verb's wildcard-all expansion includes this flag:
    /// available minus excluded
    pub fn expands_for(&self, verb: Verb) -> bool {
        self.available_for(verb) && !self.excluded_from_all.contains(&verb)
    }

    pub fn required_for(&self, verb: Verb) -> bool {
        self.required.contains(&verb)
    }

    pub fn recursive_for(&self, verb: Verb) -> bool {
        self.recursive.contains(&verb)
    }

    /// Catalog default for the verb, if one is declared
    pub fn default_for(&self, verb: Verb) -> Option<FlagValue> {
        self.defaults
            .iter()
            .find(|(v, _)| *v == verb)
            .map(|(_, d)| d.to_value())
    }
}

/// Immutable per-resource option schema
#[derive(Debug)]
pub struct Catalog {
    pub resource: &'static str,
    pub flags: &'static [FlagDescriptor],
}

impl Catalog {
    pub const fn new(resource: &'static str, flags: &'static [FlagDescriptor]) -> Self {
        Self { resource, flags }
    }

    /// Looks up a descriptor by identifier
    pub fn get(&self, id: &str) -> Option<&'static FlagDescriptor> {
        self.flags.iter().find(|f| f.id == id)
    }

    /// Options a verb accepts
    pub fn available_for(&self, verb: Verb) -> Vec<&'static FlagDescriptor> {
        self.flags.iter().filter(|f| f.available_for(verb)).collect()
    }

    /// Options the verb rejects invocations without
    pub fn required_for(&self, verb: Verb) -> Vec<&'static FlagDescriptor> {
        self.flags.iter().filter(|f| f.required_for(verb)).collect()
    }

    /// Options the verb's catch-all variant auto-expands: available minus
    /// excluded
    pub fn wildcard_expansion(&self, verb: Verb) -> Vec<&'static FlagDescriptor> {
        self.flags.iter().filter(|f| f.expands_for(verb)).collect()
    }

    /// Options eligible for recursive-mode binding under the verb
    pub fn recursive_flags(&self, verb: Verb) -> Vec<&'static FlagDescriptor> {
        self.flags.iter().filter(|f| f.recursive_for(verb)).collect()
    }

    /// Per-verb default for one flag
    pub fn default(&self, verb: Verb, id: &str) -> Option<FlagValue> {
        self.get(id).and_then(|f| f.default_for(verb))
    }

    /// Structural invariants every catalog must satisfy
    ///
    /// required ⊆ available; excluded-from-all ⊆ available; default verbs ⊆
    /// available; recursive verbs ⊆ available; unique ids.
    pub fn validate(&self) -> Result<()> {
        for flag in self.flags {
            if self.flags.iter().filter(|f| f.id == flag.id).count() > 1 {
                return Err(self.invariant(flag.id, "duplicate flag identifier"));
            }
            for verb in flag.required {
                if !flag.available_for(*verb) {
                    return Err(self.invariant(flag.id, "required verb not available"));
                }
            }
            for verb in flag.excluded_from_all {
                if !flag.available_for(*verb) {
                    return Err(self.invariant(flag.id, "excluded verb not available"));
                }
            }
            for (verb, _) in flag.defaults {
                if !flag.available_for(*verb) {
                    return Err(self.invariant(flag.id, "default verb not available"));
                }
            }
            for verb in flag.recursive {
                if !flag.available_for(*verb) {
                    return Err(self.invariant(flag.id, "recursive verb not available"));
                }
            }
        }
        Ok(())
    }

    fn invariant(&self, flag: &str, what: &str) -> Error {
        Error::InvalidInvocation(format!(
            "catalog {}: flag {}: {}",
            self.resource, flag, what
        ))
    }
}

/// Shorthand used by the per-resource descriptor tables
pub const NO_VERBS: &[Verb] = &[];
pub const NO_DEFAULTS: &[(Verb, DefaultValue)] = &[];
