mod common;

use celrip::{
    cel::container::{self, ChunkTag},
    DecodeError, DecodePolicy, DiagnosticKind, Extracted, PixelFormat,
};
use common::{ccb, chunk, encode_rows, plut, pre0, pre1_wide, solid_rows};
use image::Rgba;

const PACKED: u32 = 0x0000_0200;
const CCBPRE: u32 = 0x0040_0000;

const COLORS: [u16; 4] = [0x0000, 0x7C00, 0x03E0, 0x001F];

fn small_cel_rows() -> Vec<u8> {
    encode_rows(&[vec![Some(1), Some(2)], vec![None, Some(3)]], 4)
}

fn cels(data: &[u8]) -> Result<Vec<celrip::DecodedImage>, DecodeError> {
    match container::parse(data, &DecodePolicy::default())? {
        Extracted::Cels(cels) => Ok(cels),
        Extracted::PaletteOnly(_) => panic!("expected pixel data"),
    }
}

#[test]
fn header_palette_and_pixels() -> anyhow::Result<()> {
    let mut data = ccb(PACKED | CCBPRE, pre0(3, false, 2), 0, 2, 2);
    data.extend(plut(&COLORS));
    data.extend(chunk(b"PDAT", &small_cel_rows()));

    let cels = cels(&data)?;
    assert_eq!(cels.len(), 1);

    let cel = &cels[0];
    assert_eq!((cel.width, cel.height), (2, 2));
    assert_eq!(cel.format, PixelFormat::Indexed(celrip::BitDepth::Four));
    assert_eq!(cel.palette.as_ref().map(|palette| palette.len()), Some(4));

    let rgba = cel.to_rgba()?;
    assert_eq!(*rgba.get_pixel(0, 0), Rgba([255, 0, 0, 255]));
    assert_eq!(*rgba.get_pixel(1, 0), Rgba([0, 255, 0, 255]));
    assert_eq!(*rgba.get_pixel(0, 1), Rgba([0, 0, 0, 0]));
    assert_eq!(*rgba.get_pixel(1, 1), Rgba([0, 0, 255, 255]));

    Ok(())
}

#[test]
fn palette_after_pixels_still_applies() -> anyhow::Result<()> {
    let mut data = ccb(PACKED | CCBPRE, pre0(3, false, 2), 0, 2, 2);
    data.extend(chunk(b"PDAT", &small_cel_rows()));
    data.extend(plut(&COLORS));

    let cels = cels(&data)?;
    assert!(cels[0].palette.is_some());
    assert_eq!(*cels[0].to_rgba()?.get_pixel(1, 1), Rgba([0, 0, 255, 255]));

    Ok(())
}

#[test]
fn palette_only_file() -> anyhow::Result<()> {
    let data = plut(&COLORS);

    match container::parse(&data, &DecodePolicy::default())? {
        Extracted::PaletteOnly(palette) => {
            assert_eq!(palette.len(), 4);
            assert_eq!(palette.get(3), Rgba([0, 0, 255, 255]));
        }
        Extracted::Cels(_) => panic!("expected a palette"),
    }

    Ok(())
}

#[test]
fn unknown_chunks_and_padding_are_skipped() -> anyhow::Result<()> {
    let mut data = chunk(b"XTRA", &[1, 2, 3, 4]);
    data.extend(ccb(PACKED | CCBPRE, pre0(3, false, 2), 0, 2, 2));
    data.extend(chunk(b"PDAT", &small_cel_rows()));
    data.extend([0, 0, 0, 0]);

    let tags = container::chunks(&data)
        .map(|chunk| chunk.map(|chunk| chunk.tag))
        .collect::<Result<Vec<_>, _>>()?;
    assert_eq!(tags, vec![ChunkTag(*b"XTRA"), ChunkTag::CCB, ChunkTag::PDAT]);

    assert_eq!(cels(&data)?.len(), 1);

    Ok(())
}

#[test]
fn malformed_chunks() {
    let mut data = ccb(PACKED | CCBPRE, pre0(3, false, 2), 0, 2, 2);
    data.extend(b"PDAT");
    data.extend(4u32.to_be_bytes());
    assert!(matches!(
        cels(&data),
        Err(DecodeError::ChunkTooSmall { length: 4, .. })
    ));

    let mut data = ccb(PACKED | CCBPRE, pre0(3, false, 2), 0, 2, 2);
    data.extend(b"PDAT");
    data.extend(64u32.to_be_bytes());
    data.extend([0; 16]);
    assert!(matches!(
        cels(&data),
        Err(DecodeError::TruncatedChunk { .. })
    ));

    let data = chunk(b"CCB ", &[0; 16]);
    assert!(matches!(cels(&data), Err(DecodeError::ShortChunk { .. })));
}

#[test]
fn missing_pieces() {
    let data = chunk(b"PDAT", &small_cel_rows());
    assert!(matches!(cels(&data), Err(DecodeError::MissingHeader)));

    let data = ccb(PACKED | CCBPRE, pre0(3, false, 2), 0, 2, 2);
    assert!(matches!(cels(&data), Err(DecodeError::NoImageData)));

    let mut data = ccb(PACKED, 0, 0, 2, 2);
    data.extend(chunk(b"PDAT", &[]));
    assert!(matches!(cels(&data), Err(DecodeError::MissingPreamble)));
}

#[test]
fn invalid_headers() {
    let mut data = ccb(PACKED | CCBPRE, pre0(3, false, 2), 0, 0, 2);
    data.extend(chunk(b"PDAT", &small_cel_rows()));
    assert!(matches!(
        cels(&data),
        Err(DecodeError::InvalidDimensions { width: 0, height: 2 })
    ));

    let mut data = ccb(PACKED | CCBPRE, pre0(3, false, 2), 0, 0x7FFF_FFFF, 0x7FFF_FFFF);
    data.extend(chunk(b"PDAT", &small_cel_rows()));
    assert!(matches!(
        cels(&data),
        Err(DecodeError::InvalidDimensions {
            width: 0x7FFF_FFFF,
            height: 0x7FFF_FFFF
        })
    ));

    let mut data = ccb(PACKED | CCBPRE, pre0(3, false, 2), 0, 2049, 2);
    data.extend(chunk(b"PDAT", &small_cel_rows()));
    assert!(matches!(
        cels(&data),
        Err(DecodeError::InvalidDimensions { width: 2049, .. })
    ));

    let mut data = ccb(PACKED | CCBPRE, pre0(3, true, 2), 0, 2, 2);
    data.extend(chunk(b"PDAT", &small_cel_rows()));
    assert!(matches!(cels(&data), Err(DecodeError::UncodedDepth(4))));

    let mut data = ccb(PACKED | CCBPRE, pre0(7, false, 2), 0, 2, 2);
    data.extend(chunk(b"PDAT", &small_cel_rows()));
    assert!(matches!(cels(&data), Err(DecodeError::InvalidDepthCode(7))));
}

#[test]
fn packed_preamble_in_pixel_data() -> anyhow::Result<()> {
    let mut payload = pre0(3, false, 2).to_be_bytes().to_vec();
    payload.extend(small_cel_rows());

    let mut data = ccb(PACKED, 0, 0, 2, 2);
    data.extend(chunk(b"PDAT", &payload));

    let cels = cels(&data)?;
    assert_eq!(cels[0].pixel_data, vec![1, 2, 0, 3]);
    assert!(cels[0].diagnostics.is_empty());

    Ok(())
}

#[test]
fn unpacked_preamble_in_pixel_data() -> anyhow::Result<()> {
    let mut payload = pre0(5, true, 2).to_be_bytes().to_vec();
    payload.extend(pre1_wide(2, 2).to_be_bytes());
    payload.extend([0xE0, 0x1C, 0, 0, 0, 0, 0, 0]);
    payload.extend([0x03, 0xFF, 0, 0, 0, 0, 0, 0]);

    let mut data = ccb(0, 0, 0, 2, 2);
    data.extend(chunk(b"PDAT", &payload));

    let cels = cels(&data)?;
    assert_eq!(cels[0].format, PixelFormat::Rgba32);

    let rgba = cels[0].to_rgba()?;
    assert_eq!(*rgba.get_pixel(1, 0), Rgba([0, 255, 0, 255]));
    assert_eq!(*rgba.get_pixel(0, 1), Rgba([0, 0, 255, 255]));

    Ok(())
}

#[test]
fn unpacked_claim_with_packed_payload() -> anyhow::Result<()> {
    let mut colors = [0u16; 32];
    colors[5] = 0x7C00;

    let mut data = ccb(CCBPRE, pre0(5, false, 2), pre1_wide(16, 64), 64, 2);
    data.extend(plut(&colors));
    data.extend(chunk(b"PDAT", &encode_rows(&solid_rows(64, 2, 0xE5), 8)));

    let cels = cels(&data)?;
    let cel = &cels[0];
    assert_eq!(cel.diagnostics[0].kind, DiagnosticKind::FormatCorrected);
    assert!(!cel.is_truncated());

    let rgba = cel.to_rgba()?;
    assert_eq!(*rgba.get_pixel(10, 1), Rgba([255, 0, 0, 255]));

    Ok(())
}

#[test]
fn each_pixel_chunk_uses_the_header_before_it() -> anyhow::Result<()> {
    let mut data = ccb(PACKED | CCBPRE, pre0(3, false, 2), 0, 2, 2);
    data.extend(chunk(b"PDAT", &small_cel_rows()));
    data.extend(ccb(PACKED | CCBPRE, pre0(5, false, 1), 0, 3, 1));
    data.extend(chunk(b"PDAT", &encode_rows(&solid_rows(3, 1, 0xE2), 8)));
    data.extend(plut(&COLORS));

    let cels = cels(&data)?;
    assert_eq!(cels.len(), 2);
    assert_eq!((cels[0].width, cels[0].height), (2, 2));
    assert_eq!((cels[1].width, cels[1].height), (3, 1));
    assert_eq!(cels[1].shading, Some(vec![7, 7, 7]));
    assert_eq!(*cels[1].to_rgba()?.get_pixel(2, 0), Rgba([0, 255, 0, 255]));

    Ok(())
}
