//! Pending-list ordering and priority selection.
//!
//! Insertion order encodes `fifo`/`lifo`. Selection scans eligible items
//! left to right and only replaces the current best on a strict
//! improvement, so ties resolve to list order.

use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::engine::EngineError;

/// Insertion position for newly admitted requests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Order {
    /// Append to the tail.
    #[default]
    Fifo,
    /// Prepend to the head.
    Lifo,
}

impl FromStr for Order {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fifo" => Ok(Self::Fifo),
            "lifo" => Ok(Self::Lifo),
            other => Err(EngineError::InvalidSetting { name: "order", value: other.to_string() }),
        }
    }
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Fifo => "fifo",
            Self::Lifo => "lifo",
        })
    }
}

/// How eligible candidates are ranked against each other.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriorityPolicy {
    /// First eligible item in list order.
    #[default]
    None,
    /// Lowest priority value wins.
    Asc,
    /// Highest priority value wins.
    Desc,
}

impl PriorityPolicy {
    /// Whether `candidate` strictly beats `current`.
    ///
    /// A prioritized candidate displaces a best without priority. A
    /// candidate without priority never displaces anything.
    pub fn prefers(self, candidate: Option<i64>, current: Option<i64>) -> bool {
        match (self, candidate, current) {
            (Self::None, _, _) | (_, None, _) => false,
            (_, Some(_), None) => true,
            (Self::Asc, Some(c), Some(b)) => c < b,
            (Self::Desc, Some(c), Some(b)) => c > b,
        }
    }
}

impl FromStr for PriorityPolicy {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" | "" => Ok(Self::None),
            "asc" => Ok(Self::Asc),
            "desc" => Ok(Self::Desc),
            other => Err(EngineError::InvalidSetting { name: "priority", value: other.to_string() }),
        }
    }
}

impl fmt::Display for PriorityPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::None => "none",
            Self::Asc => "asc",
            Self::Desc => "desc",
        })
    }
}

/// Anything that can sit in a pending list.
pub trait Prioritized {
    fn priority(&self) -> Option<i64>;
    fn key(&self) -> u64;
}

/// Ordered list of pending items.
#[derive(Debug)]
pub struct PendingList<T> {
    items: VecDeque<T>,
}

impl<T: Prioritized> PendingList<T> {
    pub fn new() -> Self {
        Self { items: VecDeque::new() }
    }

    pub fn insert(&mut self, item: T, order: Order) {
        match order {
            Order::Fifo => self.items.push_back(item),
            Order::Lifo => self.items.push_front(item),
        }
    }

    /// Pick the next item among those satisfying `eligible`.
    pub fn select<F>(&self, policy: PriorityPolicy, eligible: F) -> Option<&T>
    where
        F: Fn(&T) -> bool,
    {
        let mut best: Option<&T> = None;
        for item in self.items.iter().filter(|item| eligible(item)) {
            match best {
                None => best = Some(item),
                Some(current) if policy.prefers(item.priority(), current.priority()) => {
                    best = Some(item);
                }
                Some(_) => {}
            }
        }
        best
    }

    /// Remove the item with the given key. Returns it if present.
    pub fn remove(&mut self, key: u64) -> Option<T> {
        let index = self.items.iter().position(|item| item.key() == key)?;
        self.items.remove(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<T: Prioritized> Default for PendingList<T> {
    fn default() -> Self {
        Self::new()
    }
}
