use serde::{Deserialize, Serialize};

/// Detected face in image coordinates, with the five SCRFD landmarks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaceBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub score: f32,
    /// [left_eye, right_eye, nose, left_mouth, right_mouth].
    pub landmarks: [(f32, f32); 5],
}

impl FaceBox {
    pub fn width(&self) -> f32 {
        (self.x2 - self.x1).max(0.0)
    }

    pub fn height(&self) -> f32 {
        (self.y2 - self.y1).max(0.0)
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }
}

/// Face embedding vector produced for exactly one detected face.
///
/// Serialized as a bare array of floats.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Embedding {
    values: Vec<f32>,
}

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Self { values }
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// Dimensionality of the vector.
    pub fn dim(&self) -> usize {
        self.values.len()
    }

    /// Euclidean distance to `other`, or `None` if the dimensionalities differ.
    pub fn euclidean_distance(&self, other: &Embedding) -> Option<f32> {
        if self.dim() != other.dim() {
            return None;
        }
        let sum: f32 = self
            .values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum();
        Some(sum.sqrt())
    }
}

impl From<Vec<f32>> for Embedding {
    fn from(values: Vec<f32>) -> Self {
        Self::new(values)
    }
}

/// Bounded FIFO of embeddings for one identity, oldest first.
///
/// The capacity is owned by the [`MatchPolicy`](crate::MatchPolicy) and passed
/// in on every insertion so the stored form stays a plain array of embeddings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DescriptorWindow {
    entries: Vec<Embedding>,
}

impl DescriptorWindow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a window from an ordered batch, keeping only the last `capacity` entries.
    pub fn from_batch<I>(batch: I, capacity: usize) -> Self
    where
        I: IntoIterator<Item = Embedding>,
    {
        let mut entries: Vec<Embedding> = batch.into_iter().collect();
        evict_front(&mut entries, capacity);
        Self { entries }
    }

    /// Append `embedding` at the newest end, evicting the oldest entries past `capacity`.
    #[must_use]
    pub fn append(mut self, embedding: Embedding, capacity: usize) -> Self {
        self.entries.push(embedding);
        evict_front(&mut self.entries, capacity);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Embedding> {
        self.entries.iter()
    }

    pub fn as_slice(&self) -> &[Embedding] {
        &self.entries
    }
}

fn evict_front(entries: &mut Vec<Embedding>, capacity: usize) {
    if entries.len() > capacity {
        let excess = entries.len() - capacity;
        entries.drain(..excess);
    }
}

impl<'a> IntoIterator for &'a DescriptorWindow {
    type Item = &'a Embedding;
    type IntoIter = std::slice::Iter<'a, Embedding>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Stored identity record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    /// Caller-supplied identity id.
    pub id: String,
    pub label: String,
    pub window: DescriptorWindow,
    /// Token minted by each enrollment. An adaptive update only lands on
    /// the enrollment it was scored against.
    pub enrollment_id: String,
    /// RFC 3339 timestamp of the enrollment.
    pub enrolled_at: String,
}

impl Profile {
    /// A freshly enrolled profile with a new enrollment token.
    pub fn enrolled(id: impl Into<String>, label: impl Into<String>, window: DescriptorWindow) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            window,
            enrollment_id: uuid::Uuid::new_v4().to_string(),
            enrolled_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Outcome of scoring a probe against one profile.
///
/// Carries the label and best distance on rejection too, so callers can
/// inspect how close a rejected probe was.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchVerdict {
    pub matched: bool,
    pub label: String,
    /// Best (smallest) Euclidean distance; `f32::INFINITY` for an empty window.
    pub distance: f32,
}
