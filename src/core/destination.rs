//! Log destinations and entry categories

use serde::{Deserialize, Serialize};
use std::fmt;

/// A named log stream backed by its own rotating file set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Destination {
    Application,
    Access,
    Error,
    Metrics,
}

impl Destination {
    pub const ALL: [Destination; 4] = [
        Destination::Application,
        Destination::Access,
        Destination::Error,
        Destination::Metrics,
    ];

    /// Directory (and file stem) used on disk
    pub fn dir_name(&self) -> &'static str {
        match self {
            Destination::Application => "app",
            Destination::Access => "access",
            Destination::Error => "error",
            Destination::Metrics => "metrics",
        }
    }

    #[inline]
    pub fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// Caller-supplied tag deciding which tagged destinations an entry may reach
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    #[default]
    Application,
    Access,
    Metrics,
}

/// Small set of destinations, one bit per [`Destination`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DestinationSet(u8);

impl DestinationSet {
    pub const fn empty() -> Self {
        DestinationSet(0)
    }

    pub fn insert(&mut self, destination: Destination) {
        self.0 |= 1 << destination.index();
    }

    pub fn contains(&self, destination: Destination) -> bool {
        self.0 & (1 << destination.index()) != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    /// Iterate in [`Destination::ALL`] order
    pub fn iter(&self) -> impl Iterator<Item = Destination> + '_ {
        Destination::ALL.into_iter().filter(|d| self.contains(*d))
    }
}

impl FromIterator<Destination> for DestinationSet {
    fn from_iter<I: IntoIterator<Item = Destination>>(iter: I) -> Self {
        let mut set = DestinationSet::empty();
        for d in iter {
            set.insert(d);
        }
        set
    }
}
