#![forbid(unsafe_code)]

//! Widget registry: default size and properties per widget kind.
//!
//! The engine never renders widgets; it only needs to know how big a new
//! tile of a given kind should be and what properties it starts with.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tessera_core::SizeLimits;

use crate::item::Payload;

/// Default footprint of a widget kind, in cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaultSize {
    pub w: u16,
    pub h: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_w: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_h: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_w: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_h: Option<u16>,
}

impl DefaultSize {
    /// Unbounded `w × h` footprint.
    #[must_use]
    pub const fn new(w: u16, h: u16) -> Self {
        Self {
            w,
            h,
            min_w: None,
            min_h: None,
            max_w: None,
            max_h: None,
        }
    }

    #[must_use]
    pub const fn with_min(mut self, min_w: u16, min_h: u16) -> Self {
        self.min_w = Some(min_w);
        self.min_h = Some(min_h);
        self
    }

    #[must_use]
    pub const fn with_max(mut self, max_w: u16, max_h: u16) -> Self {
        self.max_w = Some(max_w);
        self.max_h = Some(max_h);
        self
    }

    /// Resolve bounds the same way items do.
    #[must_use]
    pub fn limits(&self, columns: u16, default_max_h: u16) -> SizeLimits {
        SizeLimits::new(
            self.min_w.unwrap_or(1),
            self.min_h.unwrap_or(1),
            self.max_w.unwrap_or(columns).min(columns),
            self.max_h.unwrap_or(default_max_h),
        )
    }
}

/// Everything the engine needs to create a tile of one kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WidgetDefaults {
    pub size: DefaultSize,
    #[serde(default)]
    pub props: Payload,
}

impl WidgetDefaults {
    #[must_use]
    pub fn new(size: DefaultSize) -> Self {
        Self {
            size,
            props: Payload::new(),
        }
    }

    #[must_use]
    pub fn with_props(mut self, props: Payload) -> Self {
        self.props = props;
        self
    }
}

/// Lookup of widget defaults by kind.
pub trait WidgetRegistry {
    /// Defaults for `kind`, or `None` when the kind is unknown.
    fn lookup(&self, kind: &str) -> Option<WidgetDefaults>;
}

impl<F> WidgetRegistry for F
where
    F: Fn(&str) -> Option<WidgetDefaults>,
{
    fn lookup(&self, kind: &str) -> Option<WidgetDefaults> {
        self(kind)
    }
}

/// In-memory registry, serializable as a `{ kind: defaults }` map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StaticRegistry {
    kinds: BTreeMap<String, WidgetDefaults>,
}

impl StaticRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`register`](Self::register).
    #[must_use]
    pub fn with(mut self, kind: impl Into<String>, defaults: WidgetDefaults) -> Self {
        self.register(kind, defaults);
        self
    }

    /// Add or replace a kind.
    pub fn register(&mut self, kind: impl Into<String>, defaults: WidgetDefaults) {
        self.kinds.insert(kind.into(), defaults);
    }

    /// Registered kinds, sorted.
    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.kinds.keys().map(String::as_str)
    }
}

impl WidgetRegistry for StaticRegistry {
    fn lookup(&self, kind: &str) -> Option<WidgetDefaults> {
        self.kinds.get(kind).cloned()
    }
}
