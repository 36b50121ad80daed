//! Fixed enumeration of the (aircraft type, skill category) capabilities the
//! roster understands, plus a compact bitset over them.
//!
//! Input tables name capabilities through column headers such as `aw139_af`
//! or `sk92_av_inspec`. Every header is mapped onto this enumeration; a header
//! that does not map is a data error, not something silently ignored.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AircraftType {
    Aw139,
    H175,
    Sk92,
}

impl AircraftType {
    pub const ALL: [AircraftType; 3] = [AircraftType::Aw139, AircraftType::H175, AircraftType::Sk92];

    pub fn column(self) -> &'static str {
        match self {
            AircraftType::Aw139 => "aw139",
            AircraftType::H175 => "h175",
            AircraftType::Sk92 => "sk92",
        }
    }

    pub fn from_column(column: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.column() == column)
    }
}

impl fmt::Display for AircraftType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SkillCategory {
    Airframe,
    Rotor,
    Avionics,
}

impl SkillCategory {
    pub const ALL: [SkillCategory; 3] = [
        SkillCategory::Airframe,
        SkillCategory::Rotor,
        SkillCategory::Avionics,
    ];

    /// Column suffix used in the input tables.
    pub fn suffix(self) -> &'static str {
        match self {
            SkillCategory::Airframe => "af",
            SkillCategory::Rotor => "r",
            SkillCategory::Avionics => "av",
        }
    }

    pub fn from_suffix(suffix: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.suffix() == suffix)
    }
}

const INSPECTOR_SUFFIX: &str = "_inspec";

/// One task a worker may be qualified for: an aircraft type, a skill
/// category, and whether the qualification is the inspector variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Capability {
    pub aircraft: AircraftType,
    pub skill: SkillCategory,
    pub inspector: bool,
}

impl Capability {
    pub const COUNT: usize = 18;

    pub const fn new(aircraft: AircraftType, skill: SkillCategory) -> Self {
        Self { aircraft, skill, inspector: false }
    }

    pub const fn inspector(aircraft: AircraftType, skill: SkillCategory) -> Self {
        Self { aircraft, skill, inspector: true }
    }

    /// All 18 capabilities, regular ones first.
    pub fn all() -> impl Iterator<Item = Capability> {
        [false, true].into_iter().flat_map(|inspector| {
            AircraftType::ALL.into_iter().flat_map(move |aircraft| {
                SkillCategory::ALL
                    .into_iter()
                    .map(move |skill| Capability { aircraft, skill, inspector })
            })
        })
    }

    /// The three regular capabilities an aircraft type demands when present.
    pub fn for_aircraft(aircraft: AircraftType) -> impl Iterator<Item = Capability> {
        SkillCategory::ALL
            .into_iter()
            .map(move |skill| Capability::new(aircraft, skill))
    }

    /// The non-inspector capability this one certifies.
    pub fn regular(self) -> Capability {
        Capability { inspector: false, ..self }
    }

    fn index(self) -> u32 {
        let base = self.aircraft as u32 * 3 + self.skill as u32;
        if self.inspector { base + 9 } else { base }
    }

    pub fn column_name(self) -> String {
        let mut name = format!("{}_{}", self.aircraft.column(), self.skill.suffix());
        if self.inspector {
            name.push_str(INSPECTOR_SUFFIX);
        }
        name
    }

    /// Parses `aw139_af` or `aw139_af_inspec` style column headers.
    pub fn parse(column: &str) -> Option<Capability> {
        let (body, inspector) = match column.strip_suffix(INSPECTOR_SUFFIX) {
            Some(body) => (body, true),
            None => (column, false),
        };
        let (aircraft, skill) = body.split_once('_')?;
        Some(Capability {
            aircraft: AircraftType::from_column(aircraft)?,
            skill: SkillCategory::from_suffix(skill)?,
            inspector,
        })
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.column_name())
    }
}

/// Bitset over [`Capability`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct CapabilitySet(u32);

impl CapabilitySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, capability: Capability) {
        self.0 |= 1 << capability.index();
    }

    pub fn contains(&self, capability: Capability) -> bool {
        self.0 & (1 << capability.index()) != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn iter(&self) -> impl Iterator<Item = Capability> + '_ {
        Capability::all().filter(move |c| self.contains(*c))
    }
}

impl Extend<Capability> for CapabilitySet {
    fn extend<I: IntoIterator<Item = Capability>>(&mut self, iter: I) {
        for capability in iter {
            self.insert(capability);
        }
    }
}

impl FromIterator<Capability> for CapabilitySet {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        let mut set = CapabilitySet::new();
        set.extend(iter);
        set
    }
}
