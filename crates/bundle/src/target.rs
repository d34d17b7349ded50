use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Image format a target expects its custom icon in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IconFormat {
    Png,
    Jpeg,
}

impl IconFormat {
    pub fn mime(&self) -> &'static str {
        match self {
            IconFormat::Png => "image/png",
            IconFormat::Jpeg => "image/jpeg",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            IconFormat::Png => "png",
            IconFormat::Jpeg => "jpg",
        }
    }
}

/// The closed set of hardware targets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Target {
    Ctr,
    Hac,
    Cafe,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown target `{0}`")]
pub struct UnknownTarget(pub String);

impl Target {
    pub const ALL: [Target; 3] = [Target::Ctr, Target::Hac, Target::Cafe];

    pub fn name(&self) -> &'static str {
        match self {
            Target::Ctr => "ctr",
            Target::Hac => "hac",
            Target::Cafe => "cafe",
        }
    }

    pub fn binary_extension(&self) -> &'static str {
        match self {
            Target::Ctr => "3dsx",
            Target::Hac => "nro",
            Target::Cafe => "wuhb",
        }
    }

    /// Side length in pixels of the (square) custom icon.
    pub fn icon_size(&self) -> u32 {
        match self {
            Target::Ctr => 48,
            Target::Hac => 256,
            Target::Cafe => 128,
        }
    }

    pub fn icon_format(&self) -> IconFormat {
        match self {
            Target::Hac => IconFormat::Jpeg,
            Target::Ctr | Target::Cafe => IconFormat::Png,
        }
    }

    /// Only ctr needs textures and fonts transcoded before packaging.
    pub fn requires_conversion(&self) -> bool {
        matches!(self, Target::Ctr)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Target {
    type Err = UnknownTarget;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ctr" => Ok(Target::Ctr),
            "hac" => Ok(Target::Hac),
            "cafe" => Ok(Target::Cafe),
            _ => Err(UnknownTarget(s.to_string())),
        }
    }
}
