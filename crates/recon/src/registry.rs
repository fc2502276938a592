//! Static unit registry: unit identifier → strategy built from its embedded profile.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;

use crate::config::UnitProfile;
use crate::error::ReconError;
use crate::strategy::{Localised, OpeningBalance, SheetBased, StrategyKind, UnitStrategy};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Unit {
    Fath1,
    Fath2,
    Fath3,
    Fath5,
    Fibre,
    Mdoukal,
    Larbaa,
    Oran,
    Mags,
}

impl Unit {
    pub const ALL: [Unit; 9] = [
        Unit::Fath1,
        Unit::Fath2,
        Unit::Fath3,
        Unit::Fath5,
        Unit::Fibre,
        Unit::Mdoukal,
        Unit::Larbaa,
        Unit::Oran,
        Unit::Mags,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            Unit::Fath1 => "Fath1",
            Unit::Fath2 => "Fath2",
            Unit::Fath3 => "Fath3",
            Unit::Fath5 => "Fath5",
            Unit::Fibre => "Fibre",
            Unit::Mdoukal => "Mdoukal",
            Unit::Larbaa => "Larbaa",
            Unit::Oran => "Oran",
            Unit::Mags => "Mags",
        }
    }

    pub fn strategy_kind(&self) -> StrategyKind {
        match self {
            Unit::Larbaa | Unit::Oran => StrategyKind::SheetBased,
            Unit::Mags => StrategyKind::OpeningBalance,
            _ => StrategyKind::Localised,
        }
    }

    fn profile_source(&self) -> &'static str {
        match self {
            Unit::Fath1 => include_str!("../units/fath1.toml"),
            Unit::Fath2 => include_str!("../units/fath2.toml"),
            Unit::Fath3 => include_str!("../units/fath3.toml"),
            Unit::Fath5 => include_str!("../units/fath5.toml"),
            Unit::Fibre => include_str!("../units/fibre.toml"),
            Unit::Mdoukal => include_str!("../units/mdoukal.toml"),
            Unit::Larbaa => include_str!("../units/larbaa.toml"),
            Unit::Oran => include_str!("../units/oran.toml"),
            Unit::Mags => include_str!("../units/mags.toml"),
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Unit {
    type Err = ReconError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Unit::ALL
            .into_iter()
            .find(|u| u.id().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| ReconError::UnknownUnit(s.to_string()))
    }
}

type Entry = Result<Box<dyn UnitStrategy>, ReconError>;

static REGISTRY: Lazy<BTreeMap<Unit, Entry>> = Lazy::new(|| {
    Unit::ALL
        .into_iter()
        .map(|unit| (unit, build(unit)))
        .collect()
});

fn build(unit: Unit) -> Entry {
    let profile = UnitProfile::from_toml(unit.id(), unit.profile_source())?;
    let strategy: Box<dyn UnitStrategy> = match unit.strategy_kind() {
        StrategyKind::Localised => Box::new(Localised::new(profile)),
        StrategyKind::SheetBased => Box::new(SheetBased::new(profile)),
        StrategyKind::OpeningBalance => Box::new(OpeningBalance::new(profile)),
    };
    Ok(strategy)
}

/// The strategy for a unit. A profile that failed to parse is reported on
/// every lookup.
pub fn strategy(unit: Unit) -> Result<&'static dyn UnitStrategy, ReconError> {
    match REGISTRY.get(&unit) {
        Some(Ok(strategy)) => Ok(strategy.as_ref()),
        Some(Err(e)) => Err(e.clone()),
        None => Err(ReconError::UnknownUnit(unit.to_string())),
    }
}

/// The parsed profile of a unit.
pub fn profile(unit: Unit) -> Result<&'static UnitProfile, ReconError> {
    Ok(strategy(unit)?.profile())
}
