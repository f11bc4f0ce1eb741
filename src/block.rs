//! Block model: who set it, what it targets, how long it lasts, and what
//! scope it covers.

use crate::target::BlockTarget;
use chrono::Utc;

/// Scope restriction for a partial block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Restriction {
    /// A single page, by title.
    Page(String),
    /// A whole namespace, by numeric id.
    Namespace(i64),
}

impl Restriction {
    /// Encode as a (kind, value) pair for the restrictions table.
    pub(crate) fn to_row(&self) -> (&'static str, String) {
        match self {
            Restriction::Page(title) => ("page", title.clone()),
            Restriction::Namespace(ns) => ("namespace", ns.to_string()),
        }
    }

    /// Decode from a (kind, value) row. Unknown kinds and unparsable
    /// namespace ids yield `None`.
    pub(crate) fn from_row(kind: &str, value: &str) -> Option<Self> {
        match kind {
            "page" => Some(Restriction::Page(value.to_string())),
            "namespace" => value.parse().ok().map(Restriction::Namespace),
            _ => None,
        }
    }
}

/// A registered administrative block.
///
/// Created by an administrative action, mutated only via explicit update,
/// deleted explicitly or lazily treated as expired.
#[derive(Debug, Clone)]
pub struct Block {
    pub id: i64,
    pub target: BlockTarget,
    pub reason: Option<String>,
    /// Operator who set the block.
    pub set_by: String,
    /// Unix timestamp when the block was set.
    pub set_at: i64,
    /// Unix expiry timestamp. None = infinite.
    pub expires_at: Option<i64>,
    /// Sitewide blocks apply to every page; partial blocks only where a
    /// restriction matches.
    pub sitewide: bool,
    pub restrictions: Vec<Restriction>,
    /// Hardblocks also apply to logged-in users of a blocked address;
    /// softblocks only to anonymous use.
    pub hardblock: bool,
    pub create_account_blocked: bool,
    pub autoblock: bool,
}

impl Block {
    /// Check expiry against an explicit clock. Infinite blocks never expire.
    pub fn is_expired_at(&self, now: i64) -> bool {
        match self.expires_at {
            Some(expires) => now > expires,
            None => false,
        }
    }

    /// Check expiry against the current time.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now().timestamp())
    }

    /// Whether this block applies to the given namespace.
    pub fn applies_to_namespace(&self, ns: i64) -> bool {
        if self.sitewide {
            return true;
        }
        self.restrictions
            .iter()
            .any(|r| matches!(r, Restriction::Namespace(n) if *n == ns))
    }

    /// Whether this block applies to the given page.
    ///
    /// A page is covered by a sitewide block, by a page restriction naming
    /// its title, or by a namespace restriction covering its namespace.
    pub fn applies_to_page(&self, title: &str, ns: i64) -> bool {
        if self.sitewide {
            return true;
        }
        self.restrictions.iter().any(|r| match r {
            Restriction::Page(t) => t == title,
            Restriction::Namespace(n) => *n == ns,
        })
    }

    /// Whether this block prevents account creation.
    pub fn blocks_create_account(&self) -> bool {
        self.create_account_blocked
    }
}

/// Parameters for registering a new block. The store assigns `id` and
/// `set_at`.
#[derive(Debug, Clone)]
pub struct NewBlock {
    pub target: BlockTarget,
    pub reason: Option<String>,
    pub set_by: String,
    pub expires_at: Option<i64>,
    pub sitewide: bool,
    pub restrictions: Vec<Restriction>,
    pub hardblock: bool,
    pub create_account_blocked: bool,
    pub autoblock: bool,
}

impl NewBlock {
    /// A sitewide, infinite softblock with no restrictions.
    pub fn new(target: BlockTarget, set_by: impl Into<String>) -> Self {
        Self {
            target,
            reason: None,
            set_by: set_by.into(),
            expires_at: None,
            sitewide: true,
            restrictions: Vec::new(),
            hardblock: false,
            create_account_blocked: false,
            autoblock: false,
        }
    }
}
