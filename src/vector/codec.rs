//! Shared embedding codec: one place that converts vectors to and from
//! their serialized forms.
//!
//! Two encodings exist. The binary form (little-endian f32) backs the index
//! snapshot blob; the JSON-array form backs embedding columns in corpus
//! files and store exports. Every component goes through this module so the
//! three index instantiations cannot drift apart in how they parse vectors.

use crate::vector::types::{VectorDimension, VectorError};

/// Bytes per f32 component in the binary encoding.
pub const BYTES_PER_COMPONENT: usize = 4;

/// Encodes a vector as contiguous little-endian f32 bytes.
#[must_use]
pub fn encode_vector(vector: &[f32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(vector.len() * BYTES_PER_COMPONENT);
    for value in vector {
        out.extend_from_slice(&value.to_le_bytes());
    }
    out
}

/// Decodes a vector of the given dimension from little-endian f32 bytes.
///
/// Fails if the byte length does not match the dimension exactly.
pub fn decode_vector(bytes: &[u8], dimension: VectorDimension) -> Result<Vec<f32>, VectorError> {
    let expected = dimension.get() * BYTES_PER_COMPONENT;
    if bytes.len() != expected {
        return Err(VectorError::InvalidSnapshot(format!(
            "expected {expected} bytes for a {}-dimensional vector, got {}",
            dimension.get(),
            bytes.len()
        )));
    }
    let mut vector = Vec::with_capacity(dimension.get());
    for window in bytes.chunks_exact(BYTES_PER_COMPONENT) {
        vector.push(f32::from_le_bytes([
            window[0], window[1], window[2], window[3],
        ]));
    }
    Ok(vector)
}

/// Serializes a vector as a JSON array string.
#[must_use]
pub fn vector_to_json(vector: &[f32]) -> String {
    serde_json::to_string(vector).expect("a float slice always serializes")
}

/// Parses a vector from its stored text form.
///
/// Accepts a JSON array (`[0.1, 0.2]`) as well as the looser bracketed or
/// bare forms some database drivers emit (`(0.1, 0.2)`, `0.1 0.2`).
pub fn vector_from_json(raw: &str) -> Result<Vec<f32>, VectorError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(VectorError::InvalidSnapshot(
            "empty embedding text".to_string(),
        ));
    }
    if trimmed.starts_with('[') && trimmed.ends_with(']') {
        if let Ok(vector) = serde_json::from_str::<Vec<f32>>(trimmed) {
            return Ok(vector);
        }
    }
    let inner = trimmed.trim_matches(|c| matches!(c, '[' | ']' | '(' | ')' | '{' | '}'));
    let mut vector = Vec::new();
    for token in inner.split(|c: char| c == ',' || c.is_whitespace()) {
        if token.is_empty() {
            continue;
        }
        let value: f32 = token.parse().map_err(|_| {
            VectorError::InvalidSnapshot(format!("unparsable embedding component: {token:?}"))
        })?;
        vector.push(value);
    }
    if vector.is_empty() {
        return Err(VectorError::InvalidSnapshot(format!(
            "no embedding components in {trimmed:?}"
        )));
    }
    Ok(vector)
}

/// Scales a vector to unit L2 norm in place. A zero vector is left as-is.
pub fn l2_normalize(vector: &mut [f32]) {
    let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for value in vector.iter_mut() {
            *value /= norm;
        }
    }
}

/// Inner product of two equal-length vectors.
///
/// For unit-normalized inputs this equals their cosine similarity.
#[must_use]
pub fn inner_product(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binary_round_trip() {
        let vector = vec![0.25f32, -1.5, 3.75];
        let dim = VectorDimension::new(3).unwrap();
        let bytes = encode_vector(&vector);
        assert_eq!(bytes.len(), 12);
        assert_eq!(decode_vector(&bytes, dim).unwrap(), vector);
    }

    #[test]
    fn decode_rejects_wrong_length() {
        let dim = VectorDimension::new(4).unwrap();
        assert!(decode_vector(&[0u8; 12], dim).is_err());
    }

    #[test]
    fn json_round_trip() {
        let vector = vec![0.1f32, 0.2, 0.3];
        let text = vector_to_json(&vector);
        assert_eq!(vector_from_json(&text).unwrap(), vector);
    }

    #[test]
    fn parses_loose_database_forms() {
        assert_eq!(vector_from_json("(0.5, 1.0)").unwrap(), vec![0.5, 1.0]);
        assert_eq!(vector_from_json("0.5 1.0  2.0").unwrap(), vec![0.5, 1.0, 2.0]);
        assert!(vector_from_json("").is_err());
        assert!(vector_from_json("[a, b]").is_err());
    }

    #[test]
    fn normalization_produces_unit_length() {
        let mut vector = vec![3.0f32, 4.0];
        l2_normalize(&mut vector);
        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-6);

        let mut zero = vec![0.0f32; 3];
        l2_normalize(&mut zero);
        assert_eq!(zero, vec![0.0; 3]);
    }

    #[test]
    fn inner_product_of_unit_vectors_is_cosine() {
        let a = [1.0f32, 0.0];
        let b = [0.0f32, 1.0];
        assert_eq!(inner_product(&a, &b), 0.0);
        assert_eq!(inner_product(&a, &a), 1.0);
    }
}
