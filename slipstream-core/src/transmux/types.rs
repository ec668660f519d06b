//! Type definitions for the transmux coordination layer

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Logical track fed by one coordinator instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackKind {
    /// Primary audio/video track
    Main,
    /// Alternate audio rendition
    Audio,
}

impl std::fmt::Display for TrackKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrackKind::Main => write!(f, "main"),
            TrackKind::Audio => write!(f, "audio"),
        }
    }
}

/// Decryption method advertised by the upstream playlist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncryptionMethod {
    /// Whole-segment AES-128-CBC
    Aes128,
    /// Sample-level AES (FairPlay style)
    SampleAes,
}

/// Decryption parameters for a pushed segment.
///
/// Forwarded untouched to the processing unit; the coordination layer never
/// interprets them.
#[derive(Debug, Clone, PartialEq)]
pub struct DecryptData {
    pub method: EncryptionMethod,
    pub key: Option<Bytes>,
    pub iv: Option<[u8; 16]>,
}

/// Identity of a pushed media segment as delivered by the upstream loader.
///
/// The coordinator retains the most recent descriptor per track to compute
/// the next push's [`TransmuxState`] and to re-attach identity to results
/// coming back from the background unit, which only ever sees primitives.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentDescriptor {
    /// Quality level index
    pub level: u32,
    /// Media sequence number
    pub sn: u64,
    /// Continuity counter, changes across stream discontinuities
    pub cc: u32,
    /// Expected presentation start time in seconds
    pub start: f64,
    /// Decryption parameters, if the segment is encrypted
    pub decrypt_data: Option<DecryptData>,
}

/// Identity of a sub-segment part (low-latency delivery).
#[derive(Debug, Clone, PartialEq)]
pub struct PartDescriptor {
    /// Part index within its parent segment
    pub index: u32,
    /// Expected presentation start time in seconds
    pub start: f64,
}

/// Correlation token matching output chunks to the input segment that
/// produced them.
///
/// Echoed back unchanged by the processing unit; the coordinator never
/// interprets its contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub level: u32,
    pub sn: u64,
    pub part: u32,
}

impl ChunkMetadata {
    pub fn new(level: u32, sn: u64, part: u32) -> Self {
        Self { level, sn, part }
    }
}

/// Snapshot of the relationship between the segment being pushed and the
/// previously pushed segment for the same track.
///
/// Recomputed from scratch on every push; no field is ever carried over by
/// mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct TransmuxState {
    /// Continuity counter changed; the processing unit must reset its
    /// internal timestamp tracking
    pub discontinuity: bool,
    /// Sequence immediately follows the previous push at the same level
    pub contiguous: bool,
    /// The caller-supplied start time is trustworthy, not an estimate
    pub accurate_time_offset: bool,
    /// Playback resumed mid-stream (first segment or level switch); output
    /// must be clipped to the expected presentation window
    pub trimmed: bool,
    /// Expected presentation start time of this segment in seconds
    pub time_offset: f64,
    /// Suppress non-keyframe output in the processing unit
    pub keyframes_only: bool,
}

impl TransmuxState {
    pub fn new(
        discontinuity: bool,
        contiguous: bool,
        accurate_time_offset: bool,
        trimmed: bool,
        time_offset: f64,
        keyframes_only: bool,
    ) -> Self {
        Self {
            discontinuity,
            contiguous,
            accurate_time_offset,
            trimmed,
            time_offset,
            keyframes_only,
        }
    }

    /// Computes the state snapshot for a push, diffing the new descriptors
    /// against the last retained ones.
    pub(crate) fn derive(
        last_frag: Option<&SegmentDescriptor>,
        last_part: Option<&PartDescriptor>,
        frag: &SegmentDescriptor,
        part: Option<&PartDescriptor>,
        accurate_time_offset: bool,
        keyframes_only: bool,
    ) -> Self {
        let time_offset = part.map_or(frag.start, |p| p.start);
        let discontinuity = last_frag.is_some_and(|last| last.cc != frag.cc);
        let contiguous = match last_frag {
            Some(last) if last.level == frag.level => {
                frag.sn == last.sn + 1
                    || (frag.sn == last.sn && part_follows(last_part, part))
            }
            _ => false,
        };
        let trimmed = last_frag.map_or(true, |last| last.level != frag.level);

        Self {
            discontinuity,
            contiguous,
            accurate_time_offset,
            trimmed,
            time_offset,
            keyframes_only,
        }
    }
}

fn part_follows(last_part: Option<&PartDescriptor>, part: Option<&PartDescriptor>) -> bool {
    matches!((last_part, part), (Some(prev), Some(next)) if next.index == prev.index + 1)
}

/// Configuration applied to the processing unit before it accepts payloads.
///
/// Sent only when it changes: a freshly (re)created unit has no prior
/// configuration and is always configured before its first push.
#[derive(Debug, Clone, PartialEq)]
pub struct TransmuxConfig {
    pub audio_codec: String,
    pub video_codec: String,
    pub init_segment: Bytes,
    pub duration: f64,
}

impl TransmuxConfig {
    pub fn new(
        audio_codec: impl Into<String>,
        video_codec: impl Into<String>,
        init_segment: Bytes,
        duration: f64,
    ) -> Self {
        Self {
            audio_codec: audio_codec.into(),
            video_codec: video_codec.into(),
            init_segment,
            duration,
        }
    }

    /// True when a unit last configured with `applied` must be reconfigured
    /// before accepting this configuration's payloads.
    pub fn requires_reconfigure(&self, applied: &TransmuxConfig) -> bool {
        self.codec_change(applied) || self.init_segment != applied.init_segment
    }

    /// True when the codec hints differ from `applied`.
    pub fn codec_change(&self, applied: &TransmuxConfig) -> bool {
        self.audio_codec != applied.audio_codec || self.video_codec != applied.video_codec
    }
}

/// Browser-playable bytes produced from one pushed payload.
///
/// Opaque to the coordination layer.
#[derive(Debug, Clone, PartialEq)]
pub struct RemuxOutput {
    pub data: Bytes,
    /// Output starts on a random access point
    pub independent: bool,
}

/// One completed processing result.
///
/// The processing unit fills `output` and echoes `chunk_meta`; `frag` and
/// `part` stay `None` on the wire and are attached by the coordination layer
/// before the result is surfaced.
#[derive(Debug, Clone, PartialEq)]
pub struct TransmuxResult {
    pub output: RemuxOutput,
    pub chunk_meta: ChunkMetadata,
    pub frag: Option<SegmentDescriptor>,
    pub part: Option<PartDescriptor>,
}

/// Errors produced by processing units and their construction.
#[derive(Debug, thiserror::Error)]
pub enum TransmuxError {
    #[error("Demux failed: {reason}")]
    DemuxFailed { reason: String },

    #[error("Container format not supported: {format}")]
    UnsupportedContainer { format: String },

    #[error("Decryption failed: {reason}")]
    DecryptionFailed { reason: String },

    #[error("Processing unit construction failed: {reason}")]
    ConstructionFailed { reason: String },

    #[error("Execution unit unavailable")]
    UnitUnavailable,
}
