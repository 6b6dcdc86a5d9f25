//! Page navigation over bundle links.

use std::fmt;
use std::str::FromStr;

use helios_client_model::Bundle;
use thiserror::Error;
use tracing::warn;
use url::Url;

/// Which page of a paged result to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PageDirection {
    First,
    Previous,
    #[default]
    Next,
    Last,
}

impl PageDirection {
    /// The Atom link relation for this direction.
    pub fn rel(&self) -> &'static str {
        match self {
            PageDirection::First => "first",
            PageDirection::Previous => "previous",
            PageDirection::Next => "next",
            PageDirection::Last => "last",
        }
    }
}

impl fmt::Display for PageDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.rel())
    }
}

impl FromStr for PageDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "first" => Ok(PageDirection::First),
            "previous" | "prev" => Ok(PageDirection::Previous),
            "next" => Ok(PageDirection::Next),
            "last" => Ok(PageDirection::Last),
            other => Err(format!("unknown page direction '{}'", other)),
        }
    }
}

/// The bundle has no usable link in the requested direction.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("bundle has no {direction} page link")]
pub struct NoSuchPage {
    pub direction: PageDirection,
}

/// Returns the absolute url of the page in `direction`.
///
/// A link that is not an absolute url counts as missing.
pub fn navigate(bundle: &Bundle, direction: PageDirection) -> Result<Url, NoSuchPage> {
    let href = bundle
        .links
        .get(direction.rel())
        .ok_or(NoSuchPage { direction })?;
    Url::parse(href).map_err(|e| {
        warn!(%direction, href, error = %e, "Ignoring unusable page link");
        NoSuchPage { direction }
    })
}
