//! Tile layer payload decoding: CSV, or base64 optionally wrapped in gzip/zlib.

use crate::error::{DecodeError, InflateFailure, TokenError, TokenErrorReason};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use byteorder::{ByteOrder, LittleEndian};
use flate2::bufread::GzDecoder;
use flate2::{Decompress, FlushDecompress, Status};
use std::fmt;
use std::io::{self, Read};
use std::str::FromStr;

/// Upper bound on inflated payload size.
pub const MAX_INFLATED_BYTES: usize = 256 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Encoding {
    Csv,
    Base64,
}

impl FromStr for Encoding {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "csv" => Ok(Encoding::Csv),
            "base64" => Ok(Encoding::Base64),
            other => Err(DecodeError::UnsupportedEncoding(other.to_owned())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Compression {
    None,
    Gzip,
    Zlib,
}

impl Compression {
    /// Missing and empty attributes both mean uncompressed.
    pub fn parse(value: Option<&str>) -> Result<Self, DecodeError> {
        match value.unwrap_or("") {
            "" => Ok(Compression::None),
            "gzip" => Ok(Compression::Gzip),
            "zlib" => Ok(Compression::Zlib),
            other => Err(DecodeError::UnsupportedCompression(other.to_owned())),
        }
    }
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Compression::None => "uncompressed",
            Compression::Gzip => "gzip",
            Compression::Zlib => "zlib",
        })
    }
}

/// Decoded cell IDs plus tokens that were skipped along the way.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodedTiles {
    pub gids: Vec<u32>,
    pub token_errors: Vec<TokenError>,
}

impl DecodedTiles {
    /// Fails unless exactly `expected` cells were decoded.
    pub fn expect_len(&self, expected: usize) -> Result<(), DecodeError> {
        check_cell_count(&self.gids, expected)
    }

    /// Cell list with a `0` (no tile) wherever a token was skipped.
    pub fn with_gaps_filled(&self) -> Vec<u32> {
        if self.token_errors.is_empty() {
            return self.gids.clone();
        }
        let total = self.gids.len() + self.token_errors.len();
        let mut out = Vec::with_capacity(total);
        let mut gids = self.gids.iter();
        let mut errors = self.token_errors.iter().peekable();
        for position in 0..total {
            if errors.next_if(|e| e.position == position).is_some() {
                out.push(0);
            } else if let Some(gid) = gids.next() {
                out.push(*gid);
            }
        }
        out
    }
}

/// Decodes a textual payload into cell IDs.
///
/// CSV token problems are recoverable and reported in
/// [`DecodedTiles::token_errors`]. Everything returned as `Err` is fatal for
/// the layer or chunk being decoded.
pub fn decode(
    payload: &str,
    encoding: Encoding,
    compression: Compression,
) -> Result<DecodedTiles, DecodeError> {
    match encoding {
        Encoding::Csv => {
            if compression != Compression::None {
                return Err(DecodeError::UnsupportedCompression(format!(
                    "{compression} with csv"
                )));
            }
            Ok(decode_csv(payload))
        }
        Encoding::Base64 => Ok(DecodedTiles {
            gids: decode_base64(payload, compression)?,
            token_errors: Vec::new(),
        }),
    }
}

/// [`decode`] with encoding and compression given as document attributes.
pub fn decode_str(
    payload: &str,
    encoding: &str,
    compression: Option<&str>,
) -> Result<DecodedTiles, DecodeError> {
    decode(payload, encoding.parse()?, Compression::parse(compression)?)
}

/// Splits on commas and whitespace; bad tokens are skipped and recorded.
pub fn decode_csv(payload: &str) -> DecodedTiles {
    let mut out = DecodedTiles::default();
    let tokens = payload
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|t| !t.is_empty());
    for (position, token) in tokens.enumerate() {
        match parse_cell_token(token) {
            Ok(gid) => out.gids.push(gid),
            Err(reason) => out.token_errors.push(TokenError {
                position,
                token: token.to_owned(),
                reason,
            }),
        }
    }
    out
}

/// Parses one cell token, telling apart garbage from numbers that do not fit.
pub fn parse_cell_token(token: &str) -> Result<u32, TokenErrorReason> {
    if let Ok(gid) = token.parse::<u32>() {
        return Ok(gid);
    }
    let digits = token.strip_prefix('-').unwrap_or(token);
    if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
        Err(TokenErrorReason::OutOfRange)
    } else {
        Err(TokenErrorReason::Malformed)
    }
}

pub fn decode_base64(payload: &str, compression: Compression) -> Result<Vec<u32>, DecodeError> {
    let cleaned: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    let raw = STANDARD.decode(cleaned.as_bytes())?;
    let bytes = match compression {
        Compression::None => raw,
        Compression::Gzip | Compression::Zlib => inflate(&raw, compression)?,
    };
    bytes_to_gids(&bytes)
}

/// Little-endian `u32` per cell.
pub fn bytes_to_gids(bytes: &[u8]) -> Result<Vec<u32>, DecodeError> {
    let rem = bytes.len() % 4;
    if rem != 0 {
        return Err(DecodeError::ByteCount {
            len: bytes.len(),
            missing: 4 - rem,
        });
    }
    let mut gids = vec![0u32; bytes.len() / 4];
    LittleEndian::read_u32_into(bytes, &mut gids);
    Ok(gids)
}

pub fn check_cell_count(gids: &[u32], expected: usize) -> Result<(), DecodeError> {
    if gids.len() == expected {
        Ok(())
    } else {
        Err(DecodeError::SizeMismatch {
            expected,
            actual: gids.len(),
        })
    }
}

/// Inflates a gzip or zlib stream, up to [`MAX_INFLATED_BYTES`] of output.
pub fn inflate(bytes: &[u8], compression: Compression) -> Result<Vec<u8>, DecodeError> {
    inflate_with_limit(bytes, compression, MAX_INFLATED_BYTES)
}

/// [`inflate`] with an explicit output cap. Exceeding it is an
/// [`InflateFailure::Memory`] failure.
pub fn inflate_with_limit(
    bytes: &[u8],
    compression: Compression,
    limit: usize,
) -> Result<Vec<u8>, DecodeError> {
    let inflated = match compression {
        Compression::None => return Ok(bytes.to_vec()),
        Compression::Zlib => check_zlib_header(bytes)
            .map_err(|detail| (InflateFailure::Stream, detail))
            .and_then(|()| inflate_zlib(bytes, limit)),
        Compression::Gzip => inflate_gzip(bytes, limit),
    };
    inflated.map_err(|(failure, detail)| DecodeError::Inflate {
        compression,
        failure,
        detail,
    })
}

fn over_limit(limit: usize) -> (InflateFailure, String) {
    (
        InflateFailure::Memory,
        format!("inflated data exceeds {limit} bytes"),
    )
}

fn check_zlib_header(bytes: &[u8]) -> Result<(), String> {
    let (cmf, flg) = match bytes {
        [cmf, flg, ..] => (*cmf, *flg),
        _ => return Err(format!("{} bytes is too short for a zlib header", bytes.len())),
    };
    if cmf & 0x0f != 8 || (u16::from(cmf) << 8 | u16::from(flg)) % 31 != 0 {
        return Err(format!("not a zlib stream (header {cmf:02x} {flg:02x})"));
    }
    if flg & 0x20 != 0 {
        return Err("zlib preset dictionaries are not supported".to_owned());
    }
    Ok(())
}

/// Header, body and trailer checks come from flate2; its errors are sorted
/// into failure classes by where the stream broke off.
fn inflate_gzip(input: &[u8], limit: usize) -> Result<Vec<u8>, (InflateFailure, String)> {
    let mut decoder = GzDecoder::new(input);
    let mut out = Vec::new();
    let cap = u64::try_from(limit).unwrap_or(u64::MAX).saturating_add(1);
    let read = decoder.by_ref().take(cap).read_to_end(&mut out);
    match read {
        Ok(_) if out.len() > limit => Err(over_limit(limit)),
        Ok(_) => Ok(out),
        Err(err) => {
            let failure = match err.kind() {
                io::ErrorKind::UnexpectedEof => InflateFailure::Buffer,
                _ if decoder.header().is_none() => InflateFailure::Stream,
                _ => InflateFailure::Data,
            };
            Err((failure, err.to_string()))
        }
    }
}

fn inflate_zlib(input: &[u8], limit: usize) -> Result<Vec<u8>, (InflateFailure, String)> {
    let mut inflater = Decompress::new(true);
    let mut out = Vec::with_capacity((input.len() * 4).clamp(64, limit.max(64)));
    loop {
        if out.len() == out.capacity() {
            out.reserve(out.capacity());
        }
        let in_before = inflater.total_in();
        let out_before = inflater.total_out();
        let status = inflater
            .decompress_vec(&input[in_before as usize..], &mut out, FlushDecompress::None)
            .map_err(|e| (InflateFailure::Data, e.to_string()))?;
        if out.len() > limit {
            return Err(over_limit(limit));
        }
        match status {
            Status::StreamEnd => return Ok(out),
            Status::Ok | Status::BufError => {
                let progressed =
                    inflater.total_in() != in_before || inflater.total_out() != out_before;
                if !progressed {
                    return Err((
                        InflateFailure::Buffer,
                        format!(
                            "stream ended after {} of {} input bytes without end marker",
                            inflater.total_in(),
                            input.len()
                        ),
                    ));
                }
            }
        }
    }
}
