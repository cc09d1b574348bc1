//! Replaceable list events (contacts, mutes, people lists, relay list).

use std::fmt;

use nostr::{Event, EventBuilder, EventId, Filter, Kind, PublicKey, Tag, Timestamp};
use serde::Serialize;

use super::SyncError;
use crate::constants::{kinds, ALLOWLIST_D_TAG, FILTERLISTS_D_TAG};

/// The account lists kept in sync with relays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ListKind {
    /// Kind 3 contact list (`p` tags)
    Contacts,
    /// Kind 10000 mute list (`p` tags, encrypted private content)
    Mutes,
    /// Kind 30000 people list `d=allowlist`
    AllowList,
    /// Kind 30000 people list `d=mutelists`
    FilterList,
    /// Kind 10002 NIP-65 relay list (`r` tags)
    RelayList,
}

impl ListKind {
    pub const ALL: [ListKind; 5] = [
        ListKind::Contacts,
        ListKind::Mutes,
        ListKind::AllowList,
        ListKind::FilterList,
        ListKind::RelayList,
    ];

    pub fn kind(self) -> Kind {
        Kind::from(match self {
            Self::Contacts => kinds::CONTACT_LIST,
            Self::Mutes => kinds::MUTE_LIST,
            Self::AllowList | Self::FilterList => kinds::PEOPLE_LIST,
            Self::RelayList => kinds::RELAY_LIST,
        })
    }

    /// Identifier of addressable lists.
    pub fn d_tag(self) -> Option<&'static str> {
        match self {
            Self::AllowList => Some(ALLOWLIST_D_TAG),
            Self::FilterList => Some(FILTERLISTS_D_TAG),
            _ => None,
        }
    }

    /// Tag name holding the list's members.
    pub fn member_tag(self) -> &'static str {
        match self {
            Self::RelayList => "r",
            _ => "p",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Contacts => "contacts",
            Self::Mutes => "mutes",
            Self::AllowList => "allowlist",
            Self::FilterList => "filterlists",
            Self::RelayList => "relays",
        }
    }

    /// Filter for the author's latest version of this list.
    pub fn filter(self, author: PublicKey) -> Filter {
        let filter = Filter::new().author(author).kind(self.kind());
        match self.d_tag() {
            Some(d) => filter.identifier(d).limit(1),
            None => filter.limit(1),
        }
    }

    /// Whether `event` is a version of this list by `author`.
    pub fn matches(self, event: &Event, author: &PublicKey) -> bool {
        if event.kind != self.kind() || event.pubkey != *author {
            return false;
        }
        match self.d_tag() {
            Some(d) => event.tags.iter().any(|tag| {
                let parts = tag.as_slice();
                parts.first().map(String::as_str) == Some("d")
                    && parts.get(1).map(String::as_str) == Some(d)
            }),
            None => true,
        }
    }
}

impl fmt::Display for ListKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Decoded list event: raw tags plus opaque content.
///
/// Tags the client does not understand are carried through edits
/// untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagList {
    pub tags: Vec<Vec<String>>,
    pub content: String,
    pub created_at: u64,
    /// `None` for lists rebuilt from local storage.
    pub event_id: Option<EventId>,
}

impl TagList {
    pub fn empty(kind: ListKind) -> Self {
        let tags = kind
            .d_tag()
            .map(|d| vec![vec!["d".to_string(), d.to_string()]])
            .unwrap_or_default();
        Self {
            tags,
            content: String::new(),
            created_at: 0,
            event_id: None,
        }
    }

    pub fn from_event(event: &Event) -> Self {
        Self {
            tags: event.tags.iter().map(|t| t.as_slice().to_vec()).collect(),
            content: event.content.clone(),
            created_at: event.created_at.as_u64(),
            event_id: Some(event.id),
        }
    }

    /// Rebuild a list from stored member values.
    pub fn from_members(kind: ListKind, members: &[String], created_at: u64) -> Self {
        let mut list = Self::empty(kind);
        list.tags.extend(
            members
                .iter()
                .map(|m| vec![kind.member_tag().to_string(), m.clone()]),
        );
        list.created_at = created_at;
        list
    }

    /// Values of every `name` tag, in order, without duplicates.
    pub fn members(&self, name: &str) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        self.tags
            .iter()
            .filter(|t| t.first().map(String::as_str) == Some(name))
            .filter_map(|t| t.get(1))
            .filter(|v| seen.insert(v.as_str()))
            .cloned()
            .collect()
    }

    pub fn contains(&self, name: &str, value: &str) -> bool {
        self.tags.iter().any(|t| same_entry(t, name, value))
    }

    /// Whether the exact tag is present.
    pub fn contains_tag(&self, tag: &[String]) -> bool {
        self.tags.iter().any(|t| t.as_slice() == tag)
    }

    /// Copy with `tag` in place of any entry with the same name and value.
    pub fn with_tag(&self, tag: Vec<String>) -> Self {
        let mut next = self.clone();
        if let (Some(name), Some(value)) = (tag.first(), tag.get(1)) {
            next.tags.retain(|t| !same_entry(t, name, value));
        }
        next.tags.push(tag);
        next
    }

    pub fn without(&self, name: &str, value: &str) -> Self {
        let mut next = self.clone();
        next.tags.retain(|t| !same_entry(t, name, value));
        next
    }

    /// Unsigned event for this list at `created_at`.
    pub fn to_builder(&self, kind: ListKind, created_at: u64) -> Result<EventBuilder, SyncError> {
        let tags = self
            .tags
            .iter()
            .map(|t| Tag::parse(t.clone()).map_err(|e| SyncError::InvalidTag(e.to_string())))
            .collect::<Result<Vec<Tag>, _>>()?;
        Ok(EventBuilder::new(kind.kind(), self.content.clone())
            .tags(tags)
            .custom_created_at(Timestamp::from(created_at)))
    }
}

fn same_entry(tag: &[String], name: &str, value: &str) -> bool {
    tag.first().map(String::as_str) == Some(name) && tag.get(1).map(String::as_str) == Some(value)
}

/// Newest event by `created_at`; ties go to the lowest event id so the
/// result does not depend on arrival order.
pub fn newest<'a, I>(events: I) -> Option<&'a Event>
where
    I: IntoIterator<Item = &'a Event>,
{
    events.into_iter().reduce(|best, candidate| {
        let newer = candidate.created_at > best.created_at
            || (candidate.created_at == best.created_at && candidate.id < best.id);
        if newer {
            candidate
        } else {
            best
        }
    })
}

/// Watermark rule shared by every list kind.
pub fn is_fresh(since: Option<u64>, created_at: u64) -> bool {
    since.map_or(true, |since| created_at >= since)
}
