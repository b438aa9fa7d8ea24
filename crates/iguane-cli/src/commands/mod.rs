//! Command implementations for the iguane CLI

pub mod cluster;
pub mod compute;
pub mod devices;
pub mod dump;
pub mod units;
pub mod versions;

use crate::filter::NameFilter;
use crate::output::OutputFormatter;
use iguane_core::{Iguane, ProfileSelector, Unit};

/// State shared by every command
pub struct Context<'a> {
    pub iguane: &'a Iguane,
    pub formatter: OutputFormatter,
    pub filter: NameFilter,
    pub reverse: bool,
    pub sort: bool,
}

/// What to compute for each device
#[derive(Debug, Clone)]
pub struct Query {
    pub unit: Unit,
    pub selector: ProfileSelector,
    pub normalize: bool,
}

impl Default for Query {
    fn default() -> Self {
        Self {
            unit: Unit::Fom,
            selector: ProfileSelector::Latest,
            normalize: false,
        }
    }
}

/// Apply the listing order: declaration order, optionally reversed
fn ordered<'n, I>(names: I, reverse: bool) -> Vec<&'n str>
where
    I: DoubleEndedIterator<Item = &'n str>,
{
    if reverse {
        names.rev().collect()
    } else {
        names.collect()
    }
}
