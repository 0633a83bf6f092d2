//! Published account data model
//!
//! This module defines the externally-visible unit of the system: the
//! [`AccountRecord`] published to the account authority, plus the identity
//! and value types it is assembled from.
//!
//! ## Identity
//!
//! An [`AccountHandle`] is the stable join key between an internal entry and
//! its externally-registered record. It is immutable once constructed; every
//! other record field may change across re-registration.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Identifier of an underlying line (a dialable subscription)
///
/// Negative values are invalid; [`LineId::INVALID`] is the sentinel used by
/// collaborators that report "no such line".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LineId(pub i32);

impl LineId {
    /// Sentinel for "no line"
    pub const INVALID: LineId = LineId(-1);

    /// Whether this id refers to a real line
    pub fn is_valid(self) -> bool {
        self.0 >= 0
    }
}

impl fmt::Display for LineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of the device user that owns an account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub u32);

impl UserId {
    /// The primary (system) user
    pub const SYSTEM: UserId = UserId(0);
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of the component that owns registered accounts
///
/// The authority may hold accounts registered by other components; orphan
/// cleanup and default-outgoing reconciliation only ever touch handles whose
/// component matches ours.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ComponentName(pub String);

impl ComponentName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }
}

impl fmt::Display for ComponentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Stable identity of a published account
///
/// Identity is `(component, id, user)`. The `id` encodes the line id plus
/// the emergency/test flags, so the same line can carry distinct regular,
/// emergency, and test accounts without collision.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountHandle {
    /// Owning component
    pub component: ComponentName,
    /// Encoded account id (see [`AccountHandle::for_line`])
    pub id: String,
    /// Owning user
    pub user: UserId,
}

impl AccountHandle {
    /// Build the handle for a line-backed account
    ///
    /// Encoding:
    /// - regular account: decimal line id (`"3"`)
    /// - emergency account: `"emergency_3"`
    /// - test account: `"test_"` prefix on either of the above
    pub fn for_line(
        component: ComponentName,
        line_id: LineId,
        emergency: bool,
        test: bool,
        user: UserId,
    ) -> Self {
        let mut id = if emergency {
            format!("emergency_{line_id}")
        } else {
            line_id.to_string()
        };
        if test {
            id.insert_str(0, "test_");
        }
        Self {
            component,
            id,
            user,
        }
    }
}

impl fmt::Display for AccountHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}@{}", self.component, self.id, self.user)
    }
}

/// Capability bit-set carried by a published record
///
/// A plain bit-set rather than a list of flags because the rebuild algorithm
/// needs to *clear* bits that a previously-published record carried, not just
/// leave them unset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities(pub u32);

impl Capabilities {
    /// Account can place calls through the routing authority
    pub const CALL_PROVIDER: u32 = 1 << 0;
    /// Account is backed by a live subscription
    pub const SIM_SUBSCRIPTION: u32 = 1 << 1;
    /// Account may place emergency calls
    pub const PLACE_EMERGENCY_CALLS: u32 = 1 << 2;
    /// Account may *only* place emergency calls
    pub const EMERGENCY_CALLS_ONLY: u32 = 1 << 3;
    /// Account is visible to all users
    pub const MULTI_USER: u32 = 1 << 4;
    /// Account supports video calling
    pub const VIDEO_CALLING: u32 = 1 << 5;
    /// Video calls on this account can be paused
    pub const SUPPORTS_VIDEO_PAUSE: u32 = 1 << 6;
    /// Video capability must be confirmed via presence before offering
    pub const VIDEO_CALLING_RELIES_ON_PRESENCE: u32 = 1 << 7;
    /// Account supports video emergency calls
    pub const EMERGENCY_VIDEO_CALLING: u32 = 1 << 8;
    /// Account supports real-time text
    pub const RTT: u32 = 1 << 9;
    /// Account supports attaching a subject to outgoing calls
    pub const CALL_SUBJECT: u32 = 1 << 10;
    /// Account supports call composer attachments
    pub const CALL_COMPOSER: u32 = 1 << 11;
    /// Account supports ad-hoc conference calling
    pub const ADHOC_CONFERENCE_CALLING: u32 = 1 << 12;
    /// Account is the preferred target for emergency calls
    pub const EMERGENCY_PREFERRED: u32 = 1 << 13;

    /// Empty capability set
    pub fn empty() -> Self {
        Self(0)
    }

    /// Set the given bits
    pub fn set(&mut self, bits: u32) {
        self.0 |= bits;
    }

    /// Clear the given bits
    pub fn clear(&mut self, bits: u32) {
        self.0 &= !bits;
    }

    /// Set or clear the given bits depending on `on`
    pub fn put(&mut self, bits: u32, on: bool) {
        if on {
            self.set(bits);
        } else {
            self.clear(bits);
        }
    }

    /// Whether all of the given bits are set
    pub fn has(self, bits: u32) -> bool {
        self.0 & bits == bits
    }
}

/// A dialable address (e.g. `tel:` number)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    /// URI scheme, e.g. "tel" or "sip"
    pub scheme: String,
    /// Scheme-specific part (the number for "tel")
    pub number: String,
}

impl Address {
    /// Build a `tel:` address
    pub fn tel(number: impl Into<String>) -> Self {
        Self {
            scheme: "tel".to_string(),
            number: number.into(),
        }
    }
}

/// Icon material published with a record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Icon {
    /// A resolvable per-line icon resource
    Resource(String),
    /// Generated default glyph tinted with the line's color
    DefaultGlyph {
        /// ARGB tint
        tint: u32,
    },
}

/// Primitive value stored in a record's extras map
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExtraValue {
    Bool(bool),
    Int(i64),
    Str(String),
}

impl From<bool> for ExtraValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for ExtraValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<&str> for ExtraValue {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

/// Extras key: account supports handover of an ongoing call from another account
pub const EXTRA_SUPPORTS_HANDOVER_FROM: &str = "supports_handover_from";
/// Extras key: play a tone while recording calls on this account
pub const EXTRA_PLAY_CALL_RECORDING_TONE: &str = "play_call_recording_tone";
/// Extras key: downgrade to voice when video calls cannot be placed
pub const EXTRA_SUPPORTS_VIDEO_CALLING_FALLBACK: &str = "supports_video_calling_fallback";
/// Extras key: maximum length of an instant-lettering (call subject) message
pub const EXTRA_CALL_SUBJECT_MAX_LENGTH: &str = "call_subject_max_length";
/// Extras key: character encoding for instant-lettering messages
pub const EXTRA_CALL_SUBJECT_ENCODING: &str = "call_subject_encoding";
/// Extras key: relative ordering of accounts in selection UIs
pub const EXTRA_SORT_ORDER: &str = "sort_order";

/// Prefix for merged-SIM group ids
pub const GROUP_PREFIX: &str = "group_";

/// The published, externally-visible unit: one account record
///
/// The handle is the only immutable field; everything else is re-derived on
/// each rebuild and may change across re-registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRecord {
    /// Stable identity (join key with the authority)
    pub handle: AccountHandle,
    /// Display label
    pub label: String,
    /// Longer description shown alongside the label
    pub description: String,
    /// Icon material
    pub icon: Icon,
    /// ARGB highlight color
    pub highlight_color: u32,
    /// Capability bit-set
    pub capabilities: Capabilities,
    /// Dialable address of the line, if known
    pub address: Option<Address>,
    /// Subscription-level address (may differ from the dialable one)
    pub subscription_address: Option<Address>,
    /// Conditionally-populated extras; a key whose gate is false is omitted
    /// entirely, never set to false
    pub extras: BTreeMap<String, ExtraValue>,
    /// Empty, or `"group_" + primaryLineNumber` for merged-SIM lines
    pub group_id: String,
    /// Lines this account can be in simultaneous calls with, when restricted
    pub simultaneous_calling_restriction: Option<BTreeSet<LineId>>,
}

impl AccountRecord {
    /// Structural equality ignoring the handle
    ///
    /// The handle is the join key and never changes for a live entry, so
    /// re-registration decisions compare only the published payload.
    pub fn published_eq(&self, other: &AccountRecord) -> bool {
        self.label == other.label
            && self.description == other.description
            && self.icon == other.icon
            && self.highlight_color == other.highlight_color
            && self.capabilities == other.capabilities
            && self.address == other.address
            && self.subscription_address == other.subscription_address
            && self.extras == other.extras
            && self.group_id == other.group_id
            && self.simultaneous_calling_restriction == other.simultaneous_calling_restriction
    }
}
