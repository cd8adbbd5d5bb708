//! I/O helpers shared by the command handlers.
//!
//! Uploads are read whole and decoded through `encoding_rs` (UTF-8 unless
//! told otherwise, BOM honoured). Exports are rendered to an in-memory
//! `csv` buffer and encoded in one pass. The `-` path means stdin or stdout.

use std::{
    borrow::Cow,
    fs::File,
    io::{self, BufWriter, Read, Write},
    path::Path,
};

use anyhow::{Context, Result, anyhow};
use csv::QuoteStyle;
use encoding_rs::{Encoding, UTF_8};
use log::debug;

pub const DEFAULT_CSV_DELIMITER: u8 = b',';
pub const DEFAULT_TSV_DELIMITER: u8 = b'\t';

pub fn is_dash(path: &Path) -> bool {
    path == Path::new("-")
}

pub fn resolve_encoding(label: Option<&str>) -> Result<&'static Encoding> {
    if let Some(value) = label {
        Encoding::for_label(value.trim().as_bytes())
            .ok_or_else(|| anyhow!("Unknown encoding '{value}'"))
    } else {
        Ok(UTF_8)
    }
}

pub fn resolve_output_delimiter(path: Option<&Path>, provided: Option<u8>) -> u8 {
    if let Some(delim) = provided {
        return delim;
    }
    match path.and_then(|p| p.extension()).and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("tsv") => DEFAULT_TSV_DELIMITER,
        _ => DEFAULT_CSV_DELIMITER,
    }
}

/// Reads an upload into memory and decodes it.
pub fn read_input_text(path: &Path, encoding: &'static Encoding) -> Result<String> {
    let mut bytes = Vec::new();
    if is_dash(path) {
        io::stdin()
            .lock()
            .read_to_end(&mut bytes)
            .context("Reading upload from stdin")?;
    } else {
        File::open(path)
            .with_context(|| format!("Opening input file {path:?}"))?
            .read_to_end(&mut bytes)
            .with_context(|| format!("Reading input file {path:?}"))?;
    }
    decode_bytes(&bytes, encoding).with_context(|| format!("Decoding {path:?}"))
}

/// CSV writer that buffers the export in memory so it can be re-encoded
/// as a whole by [`write_encoded`].
pub fn csv_buffer(delimiter: u8) -> csv::Writer<Vec<u8>> {
    csv::WriterBuilder::new()
        .delimiter(delimiter)
        .quote_style(QuoteStyle::Necessary)
        .double_quote(true)
        .from_writer(Vec::new())
}

pub fn decode_bytes(bytes: &[u8], encoding: &'static Encoding) -> Result<String> {
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        Err(anyhow!(
            "Failed to decode text with encoding {}",
            encoding.name()
        ))
    } else {
        Ok(text.into_owned())
    }
}

/// Encodes `text`, failing on characters `encoding` cannot represent.
pub fn encode_text<'a>(text: &'a str, encoding: &'static Encoding) -> Result<Cow<'a, [u8]>> {
    let (bytes, used, had_errors) = encoding.encode(text);
    if had_errors {
        return Err(anyhow!(
            "Output contains characters that {} cannot represent",
            encoding.name()
        ));
    }
    debug!("Encoded {} byte(s) as {}", bytes.len(), used.name());
    Ok(bytes)
}

/// Writes UTF-8 `text` to `path` (`-` is stdout) in `encoding`.
pub fn write_encoded(path: &Path, text: &str, encoding: &'static Encoding) -> Result<()> {
    let bytes = encode_text(text, encoding)?;
    if is_dash(path) {
        let mut stdout = io::stdout().lock();
        stdout.write_all(&bytes).context("Writing to stdout")?;
        stdout.flush().context("Flushing stdout")?;
    } else {
        let mut file = BufWriter::new(
            File::create(path).with_context(|| format!("Creating output file {path:?}"))?,
        );
        file.write_all(&bytes)
            .with_context(|| format!("Writing output file {path:?}"))?;
        file.flush()
            .with_context(|| format!("Flushing output file {path:?}"))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use encoding_rs::WINDOWS_1252;

    #[test]
    fn decodes_legacy_encodings() {
        let bytes = b"name,email\nJos\xe9,j@x.com\n";
        let text = decode_bytes(bytes, WINDOWS_1252).expect("decode");
        assert!(text.contains("José"));
        assert!(decode_bytes(bytes, UTF_8).is_err());
    }

    #[test]
    fn utf8_bom_is_stripped() {
        let text = decode_bytes(b"\xef\xbb\xbfemail\n", UTF_8).expect("decode");
        assert_eq!(text, "email\n");
    }

    #[test]
    fn output_delimiter_follows_extension() {
        assert_eq!(resolve_output_delimiter(Some(Path::new("out.tsv")), None), b'\t');
        assert_eq!(resolve_output_delimiter(Some(Path::new("out.csv")), None), b',');
        assert_eq!(resolve_output_delimiter(None, Some(b';')), b';');
    }

    #[test]
    fn encodes_exports_in_legacy_encodings() {
        let bytes = encode_text("Jos\u{e9},ok\n", WINDOWS_1252).expect("encode");
        assert_eq!(&*bytes, b"Jos\xe9,ok\n");
        assert_eq!(&*encode_text("plain", UTF_8).unwrap(), b"plain");
        let err = encode_text("\u{65e5}\u{672c}", WINDOWS_1252).unwrap_err();
        assert!(err.to_string().contains("windows-1252"));
    }

    #[test]
    fn csv_buffer_quotes_only_when_needed() {
        let mut writer = csv_buffer(b';');
        writer.write_record(["a;b", "c"]).unwrap();
        let text = String::from_utf8(writer.into_inner().unwrap()).unwrap();
        assert_eq!(text, "\"a;b\";c\n");
    }

    #[test]
    fn unknown_encoding_is_rejected() {
        assert!(resolve_encoding(Some("klingon")).is_err());
        assert_eq!(resolve_encoding(Some("latin1")).unwrap(), WINDOWS_1252);
    }
}
