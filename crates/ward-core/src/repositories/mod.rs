//! Services that act on ward records through a [`RecordStore`](crate::store::RecordStore).

pub mod archive;
pub mod discharge;
pub mod patient;
