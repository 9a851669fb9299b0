//! The (time, member) coordinate grid a manifest is built over.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{RefError, RefResult};

/// Ensemble member identifier (e.g. "c00", "p01").
///
/// Opaque: ordering on the member axis is whatever order the caller supplied,
/// never the lexical order of the identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Member(String);

impl Member {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Member {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Member {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Identifies one slot of the grid: an initialization time and a member.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SlotKey {
    pub time: DateTime<Utc>,
    pub member: Member,
}

impl SlotKey {
    pub fn new(time: DateTime<Utc>, member: impl Into<Member>) -> Self {
        Self {
            time,
            member: member.into(),
        }
    }
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.time.format("%Y%m%d%H"), self.member)
    }
}

/// Index of a slot along the time and member axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotPosition {
    pub time_index: usize,
    pub member_index: usize,
}

/// Rectangular grid of initialization times x ensemble members.
///
/// Every (time, member) pair owns a slot, whether or not data is ever found
/// for it. Times are strictly increasing; members keep the caller's order and
/// must be unique.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinateGrid {
    times: Vec<DateTime<Utc>>,
    members: Vec<Member>,
    time_index: BTreeMap<DateTime<Utc>, usize>,
    member_index: HashMap<Member, usize>,
}

impl CoordinateGrid {
    pub fn new(times: Vec<DateTime<Utc>>, members: Vec<Member>) -> RefResult<Self> {
        if let Some(pair) = times.windows(2).find(|w| w[0] >= w[1]) {
            return Err(RefError::InvalidConfig(format!(
                "grid times must be strictly increasing ({} then {})",
                pair[0], pair[1]
            )));
        }

        let mut member_index = HashMap::with_capacity(members.len());
        for (i, member) in members.iter().enumerate() {
            if member.as_str().is_empty() {
                return Err(RefError::InvalidConfig("empty member identifier".to_string()));
            }
            if member_index.insert(member.clone(), i).is_some() {
                return Err(RefError::InvalidConfig(format!(
                    "duplicate member identifier: {}",
                    member
                )));
            }
        }

        let time_index = times.iter().enumerate().map(|(i, t)| (*t, i)).collect();

        Ok(Self {
            times,
            members,
            time_index,
            member_index,
        })
    }

    /// A grid with no slots.
    pub fn empty() -> Self {
        Self {
            times: Vec::new(),
            members: Vec::new(),
            time_index: BTreeMap::new(),
            member_index: HashMap::new(),
        }
    }

    pub fn times(&self) -> &[DateTime<Utc>] {
        &self.times
    }

    pub fn members(&self) -> &[Member] {
        &self.members
    }

    /// (time count, member count)
    pub fn shape(&self) -> (usize, usize) {
        (self.times.len(), self.members.len())
    }

    /// Number of slots.
    pub fn len(&self) -> usize {
        self.times.len() * self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn position(&self, key: &SlotKey) -> Option<SlotPosition> {
        let time_index = *self.time_index.get(&key.time)?;
        let member_index = *self.member_index.get(&key.member)?;
        Some(SlotPosition {
            time_index,
            member_index,
        })
    }

    pub fn contains(&self, key: &SlotKey) -> bool {
        self.position(key).is_some()
    }

    /// All slots in time-major order.
    pub fn slots(&self) -> impl Iterator<Item = (SlotPosition, SlotKey)> + '_ {
        self.times.iter().enumerate().flat_map(move |(ti, time)| {
            self.members.iter().enumerate().map(move |(mi, member)| {
                (
                    SlotPosition {
                        time_index: ti,
                        member_index: mi,
                    },
                    SlotKey {
                        time: *time,
                        member: member.clone(),
                    },
                )
            })
        })
    }
}
