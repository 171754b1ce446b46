pub mod bits;
pub mod cel;
pub mod diagnostic;
pub mod fab;
pub mod rle;

mod palette;
pub use palette::{expand_channel, parse_hex_color, rgb332, rgb555, Palette};

mod profile;
pub use profile::{PaletteSource, Profile, ProfileError, RawEntry, SpriteEntry};

mod raster;
pub use raster::{shade_color, DecodedImage, PixelFormat};

pub use bits::BitReader;
pub use cel::container::Extracted;
pub use cel::{BitDepth, CelSource, DecodeError, DecodePolicy, FormatDescriptor, Geometry};
pub use diagnostic::{DecodeStage, Diagnostic, DiagnosticKind, Severity};
pub use rle::RleCodec;
