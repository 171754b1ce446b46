use crate::cel::{BitDepth, DecodePolicy, FormatDescriptor, Geometry};
use crate::palette::parse_hex_color;
use crate::rle::RleCodec;
use crate::Palette;
use serde::{
    de::{self, Visitor},
    Deserialize,
};
use std::{
    fmt, fs,
    path::Path,
    sync::{Arc, LazyLock},
};
use thiserror::Error;

static INBUILT_PROFILE: LazyLock<Arc<Profile>> = LazyLock::new(|| {
    const INBUILT_PROFILE_SRC: &str = include_str!("profile/default.toml");
    Arc::new(Profile::parse(INBUILT_PROFILE_SRC).expect("Failed to parse inbuilt profile"))
});

#[derive(Error, Debug)]
pub enum ProfileError {
    #[error("Failed to read profile")]
    Read(#[from] std::io::Error),
    #[error("Failed to parse profile")]
    Parse(#[from] toml::de::Error),
    #[error("Raw entry '{0}' has an unsupported bit depth {1}")]
    InvalidDepth(String, u32),
    #[error("Raw entry '{0}' needs both width and height or neither")]
    PartialGeometry(String),
}

/// Decoder settings plus descriptions of headerless payloads, keyed by checksum.
#[derive(Debug, Clone, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub decode: DecodePolicy,

    #[serde(default)]
    pub fallback_palette: PaletteSource,

    #[serde(default, rename = "raw")]
    pub raw_entries: Vec<RawEntry>,

    #[serde(default, rename = "sprite")]
    pub sprite_entries: Vec<SpriteEntry>,
}

impl Profile {
    pub fn parse(profile: &str) -> Result<Profile, ProfileError> {
        let profile: Profile = toml::de::from_str(profile)?;
        profile.validate()?;
        Ok(profile)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Profile, ProfileError> {
        Self::parse(&fs::read_to_string(path)?)
    }

    pub fn inbuilt() -> Arc<Profile> {
        INBUILT_PROFILE.clone()
    }

    fn validate(&self) -> Result<(), ProfileError> {
        for entry in &self.raw_entries {
            if BitDepth::from_bits(entry.bpp).is_none()
                || (!entry.coded && !matches!(entry.bpp, 8 | 16))
            {
                return Err(ProfileError::InvalidDepth(entry.name.clone(), entry.bpp));
            }
            if entry.width.is_some() != entry.height.is_some() {
                return Err(ProfileError::PartialGeometry(entry.name.clone()));
            }
        }

        Ok(())
    }

    /// Find the raw entry describing `data`, by its CRC32.
    pub fn find_raw(&self, data: &[u8]) -> Option<&RawEntry> {
        let crc = crc32fast::hash(data);
        self.raw_entries.iter().find(|entry| entry.crc == crc)
    }

    pub fn find_sprite(&self, data: &[u8]) -> Option<&SpriteEntry> {
        let crc = crc32fast::hash(data);
        self.sprite_entries.iter().find(|entry| entry.crc == crc)
    }
}

/// A headerless CEL payload.
#[derive(Debug, Clone, Deserialize)]
pub struct RawEntry {
    pub name: String,
    pub crc: u32,

    pub bpp: u32,
    #[serde(default = "default_true")]
    pub coded: bool,
    #[serde(default = "default_true")]
    pub packed: bool,

    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    /// Bytes to skip before the pixel data.
    #[serde(default)]
    pub offset: usize,
}

impl RawEntry {
    pub fn format(&self) -> FormatDescriptor {
        let depth = BitDepth::from_bits(self.bpp).unwrap_or(BitDepth::Eight);
        FormatDescriptor::new(self.coded, self.packed, depth)
    }

    pub fn geometry(&self) -> Option<Geometry> {
        Some(Geometry::new(self.width?, self.height?))
    }
}

/// A run-length sprite of another engine.
#[derive(Debug, Clone, Deserialize)]
pub struct SpriteEntry {
    pub name: String,
    pub crc: u32,
    pub codec: RleCodec,
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub offset: usize,
}

impl SpriteEntry {
    pub fn geometry(&self) -> Geometry {
        Geometry::new(self.width, self.height)
    }
}

const fn default_true() -> bool {
    true
}

/// Where colors come from for indexed images that carry no palette.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PaletteSource {
    #[default]
    Grayscale,
    Colors(Vec<image::Rgba<u8>>),
}

impl PaletteSource {
    /// A palette with at least `entries` colors for grayscale, or the listed colors.
    pub fn palette(&self, entries: usize) -> Palette {
        match self {
            PaletteSource::Grayscale => Palette::grayscale(entries),
            PaletteSource::Colors(colors) => Palette::new(colors.clone()),
        }
    }
}

impl<'de> Deserialize<'de> for PaletteSource {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        deserializer.deserialize_any(PaletteSourceVisitor)
    }
}

struct PaletteSourceVisitor;

impl<'de> Visitor<'de> for PaletteSourceVisitor {
    type Value = PaletteSource;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("\"grayscale\" or a list of \"#rrggbb\" colors")
    }

    fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        match value {
            "grayscale" | "greyscale" => Ok(PaletteSource::Grayscale),
            other => Err(de::Error::custom(format!("Unknown palette '{other}'"))),
        }
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
    where
        A: de::SeqAccess<'de>,
    {
        let mut colors = Vec::new();

        while let Some(elem) = seq.next_element::<String>()? {
            let color = parse_hex_color(&elem)
                .ok_or_else(|| de::Error::custom(format!("Invalid color '{elem}'")))?;
            colors.push(color);
        }

        if colors.is_empty() {
            return Err(de::Error::custom("Palette needs at least one color"));
        }

        Ok(PaletteSource::Colors(colors))
    }
}
