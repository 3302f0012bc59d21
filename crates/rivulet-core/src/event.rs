use std::fmt;
use std::rc::Rc;

use crate::Value;

/// Public name consumers listen on.
pub const CHANGE: &str = "change";
/// Internal name "change" listeners are registered under.
pub const CHANGE_VALUE: &str = "changeValue";

/// Maps `"change"` to `"changeValue"` unless the literal name was requested.
pub fn internal_event_name(name: &str, literal: bool) -> &str {
    if name == CHANGE && !literal {
        CHANGE_VALUE
    } else {
        name
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Key {
    Index(usize),
    Name(Rc<str>),
}

impl Key {
    pub fn index(&self) -> Option<usize> {
        match self {
            Key::Index(i) => Some(*i),
            Key::Name(_) => None,
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Key::Name(n) => Some(n),
            Key::Index(_) => None,
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Index(i) => write!(f, "{i}"),
            Key::Name(n) => f.write_str(n),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChangeKind {
    Set,
    Push,
    Delete,
    Replace,
}

impl ChangeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ChangeKind::Set => "set",
            ChangeKind::Push => "push",
            ChangeKind::Delete => "delete",
            ChangeKind::Replace => "replace",
        }
    }
}

/// What exactly changed, so a consumer can patch instead of rebuild.
#[derive(Clone, Debug, PartialEq)]
pub enum ChangeInfo {
    Set { key: Key },
    Push { key: usize },
    Delete { id: Value, identifier: Rc<str>, key: usize },
    /// Whole-container replacement.
    Replace,
}

impl ChangeInfo {
    pub fn set_index(index: usize) -> Self {
        ChangeInfo::Set {
            key: Key::Index(index),
        }
    }

    pub fn set_name(name: &str) -> Self {
        ChangeInfo::Set {
            key: Key::Name(name.into()),
        }
    }

    pub fn kind(&self) -> ChangeKind {
        match self {
            ChangeInfo::Set { .. } => ChangeKind::Set,
            ChangeInfo::Push { .. } => ChangeKind::Push,
            ChangeInfo::Delete { .. } => ChangeKind::Delete,
            ChangeInfo::Replace => ChangeKind::Replace,
        }
    }

    pub fn key(&self) -> Option<Key> {
        match self {
            ChangeInfo::Set { key } => Some(key.clone()),
            ChangeInfo::Push { key } | ChangeInfo::Delete { key, .. } => Some(Key::Index(*key)),
            ChangeInfo::Replace => None,
        }
    }
}

/// Delivered to listeners by shared reference; handlers cannot alter it.
#[derive(Clone, Debug)]
pub struct ChangeEvent {
    pub name: Rc<str>,
    pub value: Value,
    pub old_value: Value,
    /// The container that changed.
    pub event_target: Value,
    pub change_info: Option<ChangeInfo>,
}

impl ChangeEvent {
    pub fn new(
        value: Value,
        old_value: Value,
        event_target: Value,
        change_info: Option<ChangeInfo>,
    ) -> Self {
        Self::named(CHANGE_VALUE, value, old_value, event_target, change_info)
    }

    pub fn named(
        name: &str,
        value: Value,
        old_value: Value,
        event_target: Value,
        change_info: Option<ChangeInfo>,
    ) -> Self {
        Self {
            name: name.into(),
            value,
            old_value,
            event_target,
            change_info,
        }
    }

    pub fn kind(&self) -> Option<ChangeKind> {
        self.change_info.as_ref().map(ChangeInfo::kind)
    }

    /// True when the consumer cannot patch incrementally.
    pub fn is_full_rebuild(&self) -> bool {
        matches!(self.change_info, None | Some(ChangeInfo::Replace))
    }
}
