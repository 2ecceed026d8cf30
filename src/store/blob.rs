//! Blob type - the unit of journal storage

use crate::model::NodeRecord;
use serde::{Deserialize, Serialize};

/// Type tag for blobs
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlobType {
    /// The root record, always first
    Genesis,
    /// A node appended by a successful insertion
    Node,
}

impl BlobType {
    pub fn as_byte(&self) -> u8 {
        match self {
            BlobType::Genesis => 0,
            BlobType::Node => 1,
        }
    }

    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0 => Some(BlobType::Genesis),
            1 => Some(BlobType::Node),
            _ => None,
        }
    }
}

/// A typed, compressed node record
#[derive(Clone, Debug)]
pub struct Blob {
    pub blob_type: BlobType,
    /// Raw data (uncompressed)
    pub data: Vec<u8>,
}

impl Blob {
    pub fn new(blob_type: BlobType, data: Vec<u8>) -> Self {
        Blob { blob_type, data }
    }

    /// Wrap a record, tagging it by whether it is the root
    pub fn from_record(record: &NodeRecord) -> crate::Result<Self> {
        let blob_type = if record.parent.is_none() {
            BlobType::Genesis
        } else {
            BlobType::Node
        };
        Ok(Blob::new(blob_type, bincode::serialize(record)?))
    }

    pub fn to_record(&self) -> crate::Result<NodeRecord> {
        let record: NodeRecord = bincode::deserialize(&self.data)?;
        if (self.blob_type == BlobType::Genesis) != record.parent.is_none() {
            return Err(crate::Error::Corruption(format!(
                "{:?} blob holds record {} with parent {:?}",
                self.blob_type, record.id, record.parent
            )));
        }
        Ok(record)
    }

    pub fn compress(&self) -> crate::Result<Vec<u8>> {
        let mut output = Vec::new();
        output.push(self.blob_type.as_byte());
        let compressed = zstd::encode_all(self.data.as_slice(), 3)?;
        output.extend(compressed);
        Ok(output)
    }

    pub fn decompress(data: &[u8]) -> crate::Result<Self> {
        if data.is_empty() {
            return Err(crate::Error::Corruption("Empty blob data".into()));
        }

        let blob_type = BlobType::from_byte(data[0])
            .ok_or_else(|| crate::Error::Corruption(format!("Invalid blob type: {}", data[0])))?;

        let decompressed = zstd::decode_all(&data[1..])?;

        Ok(Blob {
            blob_type,
            data: decompressed,
        })
    }
}
