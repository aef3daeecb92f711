//! Byte-encoding detection and transcoding of raw extracts to UTF-8.
//!
//! Extracts arrive as UTF-8, UTF-16 (with BOM) or a Windows code page. The
//! resolver samples the first [`SAMPLE_SIZE`] bytes, picks an encoding, then
//! decodes the whole file through a fallback chain:
//! detected (or configured) encoding, then UTF-8, then windows-1252 with
//! replacement characters. The last step never fails, so encoding problems
//! never abort a load.

use std::fs::File;
use std::io::{self, BufReader, Cursor, Read, Write};
use std::path::Path;

use chardetng::EncodingDetector;
use encoding_rs::{CoderResult, DecoderResult, Encoding, UTF_16BE, UTF_16LE, UTF_8, WINDOWS_1252};
use tempfile::NamedTempFile;

use crate::config::EncodingPreference;
use crate::error::{PipelineError, PipelineResult};

/// Number of leading bytes fed to the detector.
pub const SAMPLE_SIZE: usize = 10 * 1024;

const BUFFER_SIZE: usize = 64 * 1024;

/// Single-byte encoding used whenever detection is not confident.
pub const LEGACY_ENCODING: &Encoding = WINDOWS_1252;

/// Where decoded UTF-8 text is kept.
#[derive(Debug, Clone, Copy)]
pub enum DecodeTarget<'a> {
    /// Hold the decoded file in memory.
    Memory,
    /// Write the decoded file into a temporary file inside the given directory.
    Spool(&'a Path),
}

#[derive(Debug)]
enum Utf8Data {
    Memory(Vec<u8>),
    Spooled(NamedTempFile),
}

/// A source file decoded to UTF-8.
#[derive(Debug)]
pub struct DecodedInput {
    encoding: &'static Encoding,
    lossy: bool,
    data: Utf8Data,
}

impl DecodedInput {
    /// Encoding that successfully decoded the file.
    pub fn encoding(&self) -> &'static Encoding {
        self.encoding
    }

    pub fn encoding_name(&self) -> &'static str {
        self.encoding.name()
    }

    /// True when the final lossy fallback was needed.
    pub fn is_lossy(&self) -> bool {
        self.lossy
    }

    /// Opens a fresh reader positioned at the start of the decoded text.
    pub fn open(&self) -> PipelineResult<Box<dyn Read + Send + '_>> {
        match &self.data {
            Utf8Data::Memory(bytes) => Ok(Box::new(Cursor::new(bytes.as_slice()))),
            Utf8Data::Spooled(file) => {
                let handle = file
                    .reopen()
                    .map_err(|e| PipelineError::io(file.path(), e))?;
                Ok(Box::new(BufReader::new(handle)))
            }
        }
    }
}

/// Guess the encoding of a byte sample.
///
/// A byte-order mark wins outright and plain ASCII is read as UTF-8.
/// Otherwise the statistical guess is only
/// trusted when it is UTF-8 and the sample really is valid UTF-8 (a sequence
/// cut off at the end of an incomplete sample is tolerated); anything else
/// falls back to [`LEGACY_ENCODING`].
pub fn detect_sample(sample: &[u8], complete: bool) -> &'static Encoding {
    if let Some((encoding, _)) = Encoding::for_bom(sample) {
        return encoding;
    }
    if sample.is_ascii() {
        return UTF_8;
    }

    let mut detector = EncodingDetector::new();
    detector.feed(sample, complete);
    let guess = detector.guess(None, true);

    if guess == UTF_8 && is_valid_utf8_prefix(sample, complete) {
        UTF_8
    } else if guess == UTF_16LE || guess == UTF_16BE {
        guess
    } else {
        LEGACY_ENCODING
    }
}

fn is_valid_utf8_prefix(sample: &[u8], complete: bool) -> bool {
    match std::str::from_utf8(sample) {
        Ok(_) => true,
        Err(e) => !complete && e.error_len().is_none(),
    }
}

/// Sample the head of a file and detect its encoding.
pub fn detect_encoding(path: &Path) -> PipelineResult<&'static Encoding> {
    let file = File::open(path).map_err(|e| PipelineError::io(path, e))?;
    let mut sample = Vec::with_capacity(SAMPLE_SIZE);
    file.take(SAMPLE_SIZE as u64 + 1)
        .read_to_end(&mut sample)
        .map_err(|e| PipelineError::io(path, e))?;

    let complete = sample.len() <= SAMPLE_SIZE;
    sample.truncate(SAMPLE_SIZE);
    let encoding = detect_sample(&sample, complete);
    log::info!("Detected encoding: {}", encoding.name());
    Ok(encoding)
}

/// Ordered list of (encoding, lossy) attempts for a primary encoding.
pub fn decoding_chain(primary: &'static Encoding) -> Vec<(&'static Encoding, bool)> {
    let mut chain = vec![(primary, false)];
    if primary != UTF_8 {
        chain.push((UTF_8, false));
    }
    chain.push((LEGACY_ENCODING, true));
    chain
}

/// Picks the primary encoding from the configured preference.
pub fn primary_encoding(
    path: &Path,
    preference: EncodingPreference,
) -> PipelineResult<&'static Encoding> {
    match preference {
        EncodingPreference::Auto => detect_encoding(path),
        EncodingPreference::Utf8 => Ok(UTF_8),
        EncodingPreference::Cp1252 => Ok(WINDOWS_1252),
    }
}

/// Decode a whole file to UTF-8, walking the fallback chain.
pub fn decode_file(
    path: &Path,
    preference: EncodingPreference,
    target: DecodeTarget<'_>,
) -> PipelineResult<DecodedInput> {
    let primary = primary_encoding(path, preference)?;

    for (encoding, lossy) in decoding_chain(primary) {
        let reader = File::open(path).map_err(|e| PipelineError::io(path, e))?;
        let decoded = match target {
            DecodeTarget::Memory => {
                let mut buffer = Vec::new();
                transcode(reader, &mut buffer, encoding, lossy)
                    .map_err(|e| PipelineError::io(path, e))?
                    .then_some(Utf8Data::Memory(buffer))
            }
            DecodeTarget::Spool(dir) => {
                let mut file = tempfile::Builder::new()
                    .prefix("decoded_")
                    .suffix(".csv")
                    .tempfile_in(dir)
                    .map_err(|e| PipelineError::io(dir, e))?;
                let ok = transcode(reader, io::BufWriter::new(file.as_file_mut()), encoding, lossy)
                    .map_err(|e| PipelineError::io(path, e))?;
                if ok {
                    log::debug!("Spooled decoded input to {}", file.path().display());
                }
                ok.then_some(Utf8Data::Spooled(file))
            }
        };

        match decoded {
            Some(data) => {
                if encoding != primary {
                    log::info!("Fallback to {} encoding successful", encoding.name());
                }
                return Ok(DecodedInput {
                    encoding,
                    lossy,
                    data,
                });
            }
            None => log::warn!(
                "Decoding {} as {} failed, trying next encoding",
                path.display(),
                encoding.name()
            ),
        }
    }

    // The lossy step always succeeds.
    Err(PipelineError::execution(
        "decoding",
        format!("no encoding could decode {}", path.display()),
    ))
}

/// Stream `reader` through a decoder for `encoding` into `writer` as UTF-8.
///
/// A leading BOM is removed. Returns `Ok(false)` when `lossy` is off and the
/// input contains a sequence malformed for `encoding`; the writer then holds
/// a partial result and must be discarded.
pub fn transcode<R: Read, W: Write>(
    mut reader: R,
    mut writer: W,
    encoding: &'static Encoding,
    lossy: bool,
) -> io::Result<bool> {
    let mut decoder = encoding.new_decoder_with_bom_removal();
    let mut input = vec![0u8; BUFFER_SIZE];
    let mut output = String::with_capacity(BUFFER_SIZE * 3);

    loop {
        let read = match reader.read(&mut input) {
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        let last = read == 0;
        let mut consumed = 0;

        loop {
            let src = &input[consumed..read];
            let finished = if lossy {
                let (result, used, _) = decoder.decode_to_string(src, &mut output, last);
                consumed += used;
                matches!(result, CoderResult::InputEmpty)
            } else {
                let (result, used) =
                    decoder.decode_to_string_without_replacement(src, &mut output, last);
                consumed += used;
                match result {
                    DecoderResult::InputEmpty => true,
                    DecoderResult::OutputFull => false,
                    DecoderResult::Malformed(_, _) => return Ok(false),
                }
            };

            writer.write_all(output.as_bytes())?;
            output.clear();
            if finished {
                break;
            }
        }

        if last {
            break;
        }
    }

    writer.flush()?;
    Ok(true)
}
