#![forbid(unsafe_code)]

//! Canonical grid item model.
//!
//! A [`GridItem`] is one placed tile: identity, cell rectangle, optional size
//! bounds, the widget kind used by the host to render it, and an opaque
//! property bag the engine never inspects.

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};
use tessera_core::{GridRect, SizeLimits};

/// Opaque widget properties, passed through untouched.
pub type Payload = serde_json::Map<String, serde_json::Value>;

/// Stable identifier for a grid item.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    /// Wrap a raw identifier.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Borrow the raw identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for ItemId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ItemId {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<String> for ItemId {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

/// One tile on the grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridItem {
    pub id: ItemId,
    pub x: u16,
    pub y: u16,
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
    /// Widget registry key.
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub payload: Payload,
}

impl GridItem {
    /// Create an unconstrained item occupying `rect`.
    pub fn new(id: impl Into<ItemId>, kind: impl Into<String>, rect: GridRect) -> Self {
        Self {
            id: id.into(),
            x: rect.x,
            y: rect.y,
            w: rect.w,
            h: rect.h,
            min_w: None,
            min_h: None,
            max_w: None,
            max_h: None,
            kind: kind.into(),
            payload: Payload::new(),
        }
    }

    /// Set minimum size bounds.
    #[must_use]
    pub fn with_min_size(mut self, min_w: u16, min_h: u16) -> Self {
        self.min_w = Some(min_w);
        self.min_h = Some(min_h);
        self
    }

    /// Set maximum size bounds.
    #[must_use]
    pub fn with_max_size(mut self, max_w: u16, max_h: u16) -> Self {
        self.max_w = Some(max_w);
        self.max_h = Some(max_h);
        self
    }

    /// Replace the property bag.
    #[must_use]
    pub fn with_payload(mut self, payload: Payload) -> Self {
        self.payload = payload;
        self
    }

    /// The occupied rectangle.
    #[inline]
    #[must_use]
    pub fn rect(&self) -> GridRect {
        GridRect::new(self.x, self.y, self.w, self.h)
    }

    /// Overwrite position and size.
    #[inline]
    pub fn set_rect(&mut self, rect: GridRect) {
        self.x = rect.x;
        self.y = rect.y;
        self.w = rect.w;
        self.h = rect.h;
    }

    /// Resolve size bounds against a column count and a height cap.
    ///
    /// Unset bounds default to `1` (minimums), `columns` (max width) and
    /// `default_max_h` (max height). An explicit max width never exceeds
    /// `columns`.
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
