use anyhow::{bail, Context};
use celrip::{
    cel::{self, container},
    fab, CelSource, DecodeError, DecodedImage, Extracted, FormatDescriptor, Geometry, Palette,
    Profile, RleCodec,
};
use clap::{Args, Parser, Subcommand};
use image::RgbaImage;
use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

#[derive(Parser, Debug)]
struct Arguments {
    /// Decode profile with decoder tunables and descriptions of headerless files
    #[arg(short, long, global = true)]
    profile: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Decode 3DO CEL files into PNG images
    Cel {
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Decode headerless CEL pixel data. Without --bpp the format is taken from
    /// the profile entry matching the file's checksum
    Raw {
        input: PathBuf,

        #[command(flatten)]
        format: RawArgs,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// List the chunks of a CEL file
    Chunks { input: PathBuf },

    /// Decode a run-length encoded sprite of another engine
    Rle {
        input: PathBuf,

        #[arg(short, long)]
        codec: Option<CodecArg>,

        #[arg(long)]
        width: Option<u32>,

        #[arg(long)]
        height: Option<u32>,

        /// Bytes to skip before the encoded data
        #[arg(long)]
        offset: Option<usize>,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Decompress a MADS FAB stream
    Fab {
        input: PathBuf,

        /// Size of the decompressed data
        #[arg(short, long)]
        size: usize,

        /// Where to write the data, defaults to the input with a .bin extension
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Args, Debug, Clone)]
struct OutputArgs {
    /// The output directory for decoded images
    #[arg(short, long, default_value = "export")]
    out_dir: PathBuf,

    /// Overwrite the output directory if it already exists
    #[arg(long)]
    force: bool,

    /// Scale factor applied to exported images
    #[arg(long, default_value = "1")]
    scale: u32,
}

#[derive(Args, Debug, Clone)]
struct RawArgs {
    /// Bits per pixel: 1, 2, 4, 6, 8 or 16
    #[arg(long)]
    bpp: Option<u32>,

    /// Pixels are RGB values instead of palette indices
    #[arg(long)]
    uncoded: bool,

    /// Rows are stored without packets
    #[arg(long)]
    unpacked: bool,

    #[arg(long, requires = "height")]
    width: Option<u32>,

    #[arg(long, requires = "width")]
    height: Option<u32>,

    /// Bytes to skip before the pixel data
    #[arg(long, default_value = "0")]
    offset: usize,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum CodecArg {
    /// AGOS column-major runs
    Agos,
    /// SAGA transparent/literal run pairs
    Saga,
    /// Fugger 2 icons
    Fugger2,
}

impl From<CodecArg> for RleCodec {
    fn from(codec: CodecArg) -> Self {
        match codec {
            CodecArg::Agos => RleCodec::Agos,
            CodecArg::Saga => RleCodec::Saga,
            CodecArg::Fugger2 => RleCodec::Fugger2,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let args = Arguments::parse();
    colog::init();

    let profile = match &args.profile {
        Some(path) => Arc::new(
            Profile::load(path)
                .with_context(|| format!("Failed to load profile {}", path.display()))?,
        ),
        None => Profile::inbuilt(),
    };

    match args.command {
        Commands::Cel { inputs, output } => decode_cels(&inputs, &profile, &output),
        Commands::Raw {
            input,
            format,
            output,
        } => decode_raw(&input, &format, &profile, &output),
        Commands::Chunks { input } => list_chunks(&input),
        Commands::Rle {
            input,
            codec,
            width,
            height,
            offset,
            output,
        } => decode_rle(&input, codec, width.zip(height), offset, &profile, &output),
        Commands::Fab {
            input,
            size,
            output,
        } => {
            let data = fs::read(&input)
                .with_context(|| format!("Failed to read {}", input.display()))?;
            let decompressed = fab::decompress(&data, size)
                .with_context(|| format!("Failed to decompress {}", input.display()))?;

            let output = output.unwrap_or_else(|| input.with_extension("bin"));
            fs::write(&output, &decompressed)
                .with_context(|| format!("Failed to write {}", output.display()))?;
            log::info!("Wrote {} bytes to {}", decompressed.len(), output.display());
            Ok(())
        }
    }
}

fn prepare_out_dir(args: &OutputArgs) -> anyhow::Result<()> {
    if args.force && args.out_dir.exists() {
        fs::remove_dir_all(&args.out_dir)
            .with_context(|| "Failed to clean up old output directory")?;
    }
    fs::create_dir_all(&args.out_dir).with_context(|| "Failed to create output directory")
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string())
}

fn decode_cels(inputs: &[PathBuf], profile: &Profile, args: &OutputArgs) -> anyhow::Result<()> {
    use indicatif::{ParallelProgressIterator, ProgressBar};
    use rayon::prelude::*;

    prepare_out_dir(args)?;
    log::info!("Decoding {} files...", inputs.len());

    let progress = ProgressBar::new(inputs.len() as u64);
    let failed = inputs
        .par_iter()
        .progress_with(progress.clone())
        .filter(|path| match decode_cel_file(path, profile, args) {
            Ok(written) => {
                progress.println(format!("{}: {} image(s)", path.display(), written));
                false
            }
            Err(err) => {
                progress.suspend(|| log::error!("{}: {err:#}", path.display()));
                true
            }
        })
        .count();

    progress.finish_and_clear();
    log::info!(
        "Done! Decoded {} of {} files",
        inputs.len() - failed,
        inputs.len()
    );

    Ok(())
}

fn decode_cel_file(path: &Path, profile: &Profile, args: &OutputArgs) -> anyhow::Result<usize> {
    let data = fs::read(path).with_context(|| "Failed to read file")?;
    let stem = file_stem(path);

    match container::parse(&data, &profile.decode)? {
        Extracted::PaletteOnly(palette) => {
            let swatch = palette_swatch(&palette)?;
            save(&swatch, &args.out_dir.join(format!("{stem}_palette.png")), args.scale)?;
            Ok(1)
        }
        Extracted::Cels(cels) => {
            // render everything first so a failing cel leaves no files behind
            let images = cels
                .iter()
                .map(|cel| render(cel, profile))
                .collect::<anyhow::Result<Vec<_>>>()?;

            for (i, image) in images.iter().enumerate() {
                let name = if images.len() == 1 {
                    format!("{stem}.png")
                } else {
                    format!("{stem}_{i:03}.png")
                };
                save(image, &args.out_dir.join(name), args.scale)?;
            }
            Ok(images.len())
        }
    }
}

fn decode_raw(
    input: &Path,
    format: &RawArgs,
    profile: &Profile,
    args: &OutputArgs,
) -> anyhow::Result<()> {
    let data = fs::read(input).with_context(|| format!("Failed to read {}", input.display()))?;

    let (descriptor, geometry, offset) = match format.bpp {
        Some(bpp) => {
            let Some(depth) = celrip::BitDepth::from_bits(bpp) else {
                bail!("Unsupported bit depth {bpp}");
            };
            let descriptor = FormatDescriptor::new(!format.uncoded, !format.unpacked, depth);
            if !descriptor.is_valid() {
                bail!("Uncoded pixels need 8 or 16 bits per pixel");
            }
            let geometry = format
                .width
                .zip(format.height)
                .map(|(width, height)| Geometry::new(width, height));
            (descriptor, geometry, format.offset)
        }
        None => {
            let entry = profile.find_raw(&data).with_context(|| {
                "No profile entry matches this file. Please pass --bpp or provide a profile."
            })?;
            log::info!("Using profile entry '{}'", entry.name);
            (entry.format(), entry.geometry(), entry.offset)
        }
    };

    let payload = data
        .get(offset..)
        .with_context(|| format!("Offset {offset:#x} is past the end of the file"))?;

    let mut source = CelSource::new(payload, descriptor);
    if let Some(geometry) = geometry {
        source = source.with_geometry(geometry);
    }
    let decoded = cel::decode(&source, &profile.decode)?;
    log::info!(
        "Decoded {}x{} image{}",
        decoded.width,
        decoded.height,
        if decoded.is_truncated() { " (truncated)" } else { "" }
    );

    let image = render(&decoded, profile)?;
    prepare_out_dir(args)?;
    save(&image, &args.out_dir.join(format!("{}.png", file_stem(input))), args.scale)
}

fn decode_rle(
    input: &Path,
    codec: Option<CodecArg>,
    size: Option<(u32, u32)>,
    offset: Option<usize>,
    profile: &Profile,
    args: &OutputArgs,
) -> anyhow::Result<()> {
    let data = fs::read(input).with_context(|| format!("Failed to read {}", input.display()))?;

    let (codec, geometry, offset) = match (codec, size) {
        (Some(codec), Some((width, height))) => (
            RleCodec::from(codec),
            Geometry::new(width, height),
            offset.unwrap_or(0),
        ),
        _ => {
            let entry = profile.find_sprite(&data).with_context(|| {
                "No profile entry matches this file. Please pass --codec, --width and --height."
            })?;
            log::info!("Using profile entry '{}'", entry.name);
            (entry.codec, entry.geometry(), offset.unwrap_or(entry.offset))
        }
    };

    let geometry = geometry.validate()?;

    let payload = data
        .get(offset..)
        .with_context(|| format!("Offset {offset:#x} is past the end of the file"))?;
    let decoded = codec.decode(payload, geometry);

    let image = render(&decoded, profile)?;
    prepare_out_dir(args)?;
    save(&image, &args.out_dir.join(format!("{}.png", file_stem(input))), args.scale)
}

/// Materialize an image, falling back to the profile's palette when it has none.
fn render(image: &DecodedImage, profile: &Profile) -> anyhow::Result<RgbaImage> {
    match image.to_rgba() {
        Err(DecodeError::MissingPalette) => {
            let entries = match image.format {
                celrip::PixelFormat::Indexed(depth) => 1usize << depth.bits().min(8),
                celrip::PixelFormat::Rgba32 => 256,
            };
            log::warn!("Image has no palette, using the fallback palette");
            let palette = profile.fallback_palette.palette(entries);
            Ok(image.to_rgba_with(Some(&palette))?)
        }
        result => Ok(result?),
    }
}

fn palette_swatch(palette: &Palette) -> anyhow::Result<RgbaImage> {
    const COLUMNS: usize = 16;

    if palette.is_empty() {
        bail!("Palette has no entries");
    }

    let rows = palette.len().div_ceil(COLUMNS);
    Ok(RgbaImage::from_fn(COLUMNS as u32, rows as u32, |x, y| {
        let i = y as usize * COLUMNS + x as usize;
        if i < palette.len() {
            palette.get(i)
        } else {
            image::Rgba([0, 0, 0, 0])
        }
    }))
}

fn save(image: &RgbaImage, path: &Path, scale: u32) -> anyhow::Result<()> {
    let scale = scale.max(1);
    let image = if scale == 1 {
        image.clone()
    } else {
        image::imageops::resize(
            image,
            image.width() * scale,
            image.height() * scale,
            image::imageops::FilterType::Nearest,
        )
    };

    image
        .save(path)
        .with_context(|| format!("Failed to save {}", path.display()))?;
    log::info!("Exported image: {}", path.display());

    Ok(())
}

fn list_chunks(input: &Path) -> anyhow::Result<()> {
    let data = fs::read(input).with_context(|| format!("Failed to read {}", input.display()))?;

    for chunk in container::chunks(&data) {
        let chunk = chunk?;
        println!(
            "{:#08x}  '{}'  {:>8} bytes",
            chunk.offset, chunk.tag, chunk.length
        );

        match chunk.tag {
            container::ChunkTag::CCB => {
                let header = container::CcbHeader::parse(chunk.payload)?;
                let preamble = container::Preamble {
                    pre0: header.pre0,
                    pre1: Some(header.pre1),
                };
                println!(
                    "    {}x{}, flags {:#010x}, packed: {}, preamble in CCB: {}, PIXC {:#010x}",
                    header.width,
                    header.height,
                    header.flags,
                    header.is_packed(),
                    header.preamble_in_header(),
                    header.pixc,
                );
                if header.preamble_in_header() {
                    let depth = preamble.depth().map_or_else(
                        |_| "invalid depth".to_string(),
                        |depth| format!("{}bpp", depth.bits()),
                    );
                    println!(
                        "    PRE0 {:#010x} ({depth}, coded: {}, {} rows), PRE1 {:#010x} ({} wide)",
                        header.pre0,
                        preamble.coded(),
                        preamble.height(),
                        header.pre1,
                        preamble.width().unwrap_or_default(),
                    );
                }
            }
            container::ChunkTag::PLUT => {
                let palette = container::parse_plut(chunk.payload)?;
                println!("    {} colors", palette.len());
            }
            _ => {}
        }
    }

    Ok(())
}
