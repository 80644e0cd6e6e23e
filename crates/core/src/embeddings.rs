use crate::error::StoreError;
use async_trait::async_trait;

const DEFAULT: usize = 128;

pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = DEFAULT;

#[async_trait]
pub trait Embedder: Send + Sync {
    fn dimensions(&self) -> usize;

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, StoreError>;

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, StoreError> {
        let mut vectors = self.embed_documents(&[text.to_string()]).await?;
        vectors.pop().ok_or_else(|| StoreError::BackendResponse {
            backend: "embedder".to_string(),
            details: "no embedding returned for query".to_string(),
        })
    }
}

/// Offline embedder hashing character trigrams into a fixed number of
/// buckets. Vectors are L2-normalized.
#[derive(Debug, Clone, Copy)]
pub struct CharacterNgramEmbedder {
    pub dimensions: usize,
}

impl Default for CharacterNgramEmbedder {
    fn default() -> Self {
        Self {
            dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
        }
    }
}

impl CharacterNgramEmbedder {
    pub fn embed(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0f32; self.dimensions.max(1)];
        let lowered = text.to_lowercase();
        let chars: Vec<char> = lowered.chars().collect();

        if chars.is_empty() {
            return vector;
        }

        for window in chars.windows(3) {
            let token = window.iter().collect::<String>();
            let mut hash = 1469598103934665603u64;
            for byte in token.bytes() {
                hash ^= byte as u64;
                hash = hash.wrapping_mul(1099511628211);
            }
            let bucket = (hash % vector.len() as u64) as usize;
            vector[bucket] += 1.0;
        }

        let magnitude = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for value in &mut vector {
                *value /= magnitude;
            }
        }

        vector
    }
}

#[async_trait]
impl Embedder for CharacterNgramEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions.max(1)
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, StoreError> {
        Ok(texts.iter().map(|text| self.embed(text)).collect())
    }
}

/// Cosine similarity mapped onto [0, 1]: `1 - cosine_distance / 2`.
pub fn similarity(left: &[f32], right: &[f32]) -> f64 {
    let dot = left
        .iter()
        .zip(right)
        .map(|(a, b)| f64::from(*a) * f64::from(*b))
        .sum::<f64>();
    let left_norm = left.iter().map(|a| f64::from(*a).powi(2)).sum::<f64>().sqrt();
    let right_norm = right.iter().map(|b| f64::from(*b).powi(2)).sum::<f64>().sqrt();

    if left_norm == 0.0 || right_norm == 0.0 {
        return 0.5;
    }

    let cosine = (dot / (left_norm * right_norm)).clamp(-1.0, 1.0);
    distance_to_similarity(1.0 - cosine)
}

pub fn distance_to_similarity(cosine_distance: f64) -> f64 {
    (1.0 - cosine_distance / 2.0).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::{similarity, CharacterNgramEmbedder, Embedder};

    #[test]
    fn embedder_is_deterministic() {
        let embedder = CharacterNgramEmbedder::default();
        let first = embedder.embed("Hydraulic pressure and flow");
        let second = embedder.embed("Hydraulic pressure and flow");
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn embedder_outputs_expected_length() {
        let embedder = CharacterNgramEmbedder { dimensions: 32 };
        let vectors = embedder
            .embed_documents(&["abc".to_string(), "abcd".to_string()])
            .await
            .expect("embedding");
        assert_eq!(vectors.len(), 2);
        assert!(vectors.iter().all(|vector| vector.len() == 32));
    }

    #[test]
    fn identical_text_is_a_perfect_match() {
        let embedder = CharacterNgramEmbedder::default();
        let vector = embedder.embed("pump maintenance schedule");
        assert!((similarity(&vector, &vector) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn opposite_vectors_score_zero() {
        assert!(similarity(&[1.0, 0.0], &[-1.0, 0.0]).abs() < 1e-9);
        assert!((similarity(&[1.0, 0.0], &[0.0, 1.0]) - 0.5).abs() < 1e-9);
    }
}
