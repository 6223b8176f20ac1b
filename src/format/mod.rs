//! Container format implementations.
//!
//! Only the MPEG transport stream lives here today; the FLV muxer used by
//! the RTMP endpoint shares the [`crate::av::Muxer`] contract but is a
//! separate concern.

pub mod ts;

pub use self::ts::{TsMuxer, TsWriter};
