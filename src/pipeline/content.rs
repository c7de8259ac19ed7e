//! Content extraction: resolves one plain-text body from a content tree.
//!
//! Full pre-order traversal; the first decodable `text/plain` node is the
//! plain candidate and the first decodable `text/html` node the rich one.
//! Plain wins when non-empty, rich is returned verbatim otherwise.

use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use tracing::debug;

use crate::mail::{ContentNode, MediaSubtype};

/// URL-safe base64 that accepts padded and unpadded input.
const BODY_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Decode one node's inline data. `None` if absent or undecodable.
pub fn decode_node(node: &ContentNode) -> Option<String> {
    let data = node.data.as_deref()?;
    match BODY_ENGINE.decode(data.trim()) {
        Ok(bytes) => Some(String::from_utf8_lossy(&bytes).into_owned()),
        Err(e) => {
            debug!(mime_type = %node.mime_type, error = %e, "Skipping undecodable content node");
            None
        }
    }
}

/// Extract the canonical text body. Empty string if no text-bearing part decodes.
pub fn extract_text(root: &ContentNode) -> String {
    let mut plain: Option<String> = None;
    let mut rich: Option<String> = None;

    // Explicit stack keeps deep nesting off the call stack.
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        match node.subtype() {
            MediaSubtype::Plain if plain.as_deref().is_none_or(str::is_empty) => {
                plain = decode_node(node).or(plain);
            }
            MediaSubtype::Rich if rich.as_deref().is_none_or(str::is_empty) => {
                rich = decode_node(node).or(rich);
            }
            _ => {}
        }
        stack.extend(node.children.iter().rev());
    }

    match (plain, rich) {
        (Some(text), _) if !text.is_empty() => text,
        (_, Some(html)) => html,
        _ => String::new(),
    }
}
