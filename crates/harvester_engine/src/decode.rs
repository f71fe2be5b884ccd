use chardetng::EncodingDetector;
use encoding_rs::Encoding;

use crate::{ProviderError, ProviderFailure};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedBody {
    pub text: String,
    pub encoding: &'static str,
}

/// Decode a response body to UTF-8: BOM, then the Content-Type charset, then
/// chardetng's guess. Undecodable bytes make the page malformed.
pub fn decode_body(bytes: &[u8], content_type: Option<&str>) -> Result<DecodedBody, ProviderError> {
    if let Some((encoding, _)) = Encoding::for_bom(bytes) {
        return decode_with(bytes, encoding);
    }

    if let Some(enc) = content_type
        .and_then(charset_label)
        .and_then(|label| Encoding::for_label(label.as_bytes()))
    {
        return decode_with(bytes, enc);
    }

    let mut detector = EncodingDetector::new();
    detector.feed(bytes, true);
    decode_with(bytes, detector.guess(None, true))
}

fn charset_label(content_type: &str) -> Option<String> {
    content_type.split(';').find_map(|part| {
        let (key, value) = part.split_once('=')?;
        key.trim()
            .eq_ignore_ascii_case("charset")
            .then(|| value.trim().trim_matches(['"', '\'']).to_string())
    })
}

fn decode_with(bytes: &[u8], enc: &'static Encoding) -> Result<DecodedBody, ProviderError> {
    let (text, _, had_errors) = enc.decode(bytes);
    if had_errors {
        return Err(ProviderError::new(
            ProviderFailure::Malformed,
            format!("body is not valid {}", enc.name()),
        ));
    }
    Ok(DecodedBody {
        text: text.into_owned(),
        encoding: enc.name(),
    })
}
