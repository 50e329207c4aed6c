use crate::KeyPoint;

/// Binary feature vector attached to one keypoint.
#[derive(Debug, Clone)]
pub struct Descriptor {
    pub data: Vec<u8>,
    pub keypoint: KeyPoint,
}

impl Descriptor {
    pub fn new(data: Vec<u8>, keypoint: KeyPoint) -> Self {
        Self { data, keypoint }
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn hamming_distance(&self, other: &Descriptor) -> u32 {
        hamming_distance(&self.data, &other.data)
    }
}

pub fn hamming_distance(a: &[u8], b: &[u8]) -> u32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x ^ y).count_ones())
        .sum()
}

/// Descriptor set of one image, index-aligned with its keypoints.
#[derive(Debug, Clone, Default)]
pub struct Descriptors {
    pub descriptors: Vec<Descriptor>,
}

impl Descriptors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            descriptors: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, desc: Descriptor) {
        self.descriptors.push(desc);
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Descriptor> {
        self.descriptors.iter()
    }

    pub fn get(&self, index: usize) -> Option<&Descriptor> {
        self.descriptors.get(index)
    }

    /// Length in bytes shared by every descriptor, `None` for an empty or ragged set.
    pub fn descriptor_size(&self) -> Option<usize> {
        let first = self.descriptors.first()?.size();
        self.descriptors
            .iter()
            .all(|d| d.size() == first)
            .then_some(first)
    }

    pub fn keypoints(&self) -> Vec<KeyPoint> {
        self.descriptors.iter().map(|d| d.keypoint).collect()
    }
}

impl From<Vec<Descriptor>> for Descriptors {
    fn from(descriptors: Vec<Descriptor>) -> Self {
        Self { descriptors }
    }
}
