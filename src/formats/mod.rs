//! Static media format registries
//!
//! Two independent, immutable registries (image and audio) keyed by format
//! name. Capability flags drive the gating logic downstream: quality only
//! applies to image formats that declare `supports_quality`, a bitrate flag
//! is only ever passed to the transcoder for audio formats that declare
//! `supports_bitrate`.
//!
//! Lookups are type-scoped on purpose. An image name must never match an
//! audio registry entry (or vice versa) because the transform dispatch
//! depends on knowing which kind produced the match.

/// Media kind a format belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Audio,
}

/// One registry entry: defined once at process start, immutable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaFormat {
    /// Format name as it appears in transform directives
    pub name: &'static str,
    pub kind: MediaKind,
    /// Encoder identifier: the internal encoder for images, the ffmpeg
    /// codec name for audio
    pub encoder: &'static str,
    /// Content-Type of the produced variant
    pub content_type: &'static str,
    /// Image formats: whether lossy encoding at a requested quality applies
    pub supports_quality: bool,
    /// Audio formats: whether a variable bitrate flag applies
    pub supports_bitrate: bool,
}

/// Image registry, declared best-compression-first.
///
/// Declaration order doubles as the `format=auto` resolution order: the
/// first name found as a substring of the Accept header wins.
pub const IMAGE_FORMATS: &[MediaFormat] = &[
    MediaFormat {
        name: "avif",
        kind: MediaKind::Image,
        encoder: "avif",
        content_type: "image/avif",
        supports_quality: true,
        supports_bitrate: false,
    },
    MediaFormat {
        name: "webp",
        kind: MediaKind::Image,
        encoder: "webp",
        content_type: "image/webp",
        supports_quality: true,
        supports_bitrate: false,
    },
    MediaFormat {
        name: "jpeg",
        kind: MediaKind::Image,
        encoder: "jpeg",
        content_type: "image/jpeg",
        supports_quality: true,
        supports_bitrate: false,
    },
    MediaFormat {
        name: "png",
        kind: MediaKind::Image,
        encoder: "png",
        content_type: "image/png",
        supports_quality: false,
        supports_bitrate: false,
    },
    MediaFormat {
        name: "gif",
        kind: MediaKind::Image,
        encoder: "gif",
        content_type: "image/gif",
        supports_quality: false,
        supports_bitrate: false,
    },
];

/// Audio registry. `encoder` is the ffmpeg codec passed via `-acodec`.
pub const AUDIO_FORMATS: &[MediaFormat] = &[
    MediaFormat {
        name: "mp3",
        kind: MediaKind::Audio,
        encoder: "libmp3lame",
        content_type: "audio/mpeg",
        supports_quality: false,
        supports_bitrate: true,
    },
    MediaFormat {
        name: "ogg",
        kind: MediaKind::Audio,
        encoder: "libvorbis",
        content_type: "audio/ogg",
        supports_quality: false,
        supports_bitrate: true,
    },
    MediaFormat {
        name: "opus",
        kind: MediaKind::Audio,
        encoder: "libopus",
        content_type: "audio/opus",
        supports_quality: false,
        supports_bitrate: true,
    },
    MediaFormat {
        name: "aac",
        kind: MediaKind::Audio,
        encoder: "aac",
        content_type: "audio/aac",
        supports_quality: false,
        supports_bitrate: true,
    },
    MediaFormat {
        name: "flac",
        kind: MediaKind::Audio,
        encoder: "flac",
        content_type: "audio/flac",
        supports_quality: false,
        supports_bitrate: false,
    },
    MediaFormat {
        name: "wav",
        kind: MediaKind::Audio,
        encoder: "pcm_s16le",
        content_type: "audio/wav",
        supports_quality: false,
        supports_bitrate: false,
    },
];

/// Look up an image format by name (expects a lower-cased name).
pub fn lookup_image(name: &str) -> Option<&'static MediaFormat> {
    IMAGE_FORMATS.iter().find(|f| f.name == name)
}

/// Look up an audio format by name (expects a lower-cased name).
pub fn lookup_audio(name: &str) -> Option<&'static MediaFormat> {
    AUDIO_FORMATS.iter().find(|f| f.name == name)
}

/// Whether a name is known to either registry.
///
/// Used by the edge normalizer to validate `format=<name>`; the engine
/// still re-resolves type-scoped against the fetched content type.
pub fn is_supported_format(name: &str, audio_enabled: bool) -> bool {
    lookup_image(name).is_some() || (audio_enabled && lookup_audio(name).is_some())
}

/// Resolve an image format from a source content type (e.g. `image/jpeg`).
pub fn image_format_for_content_type(content_type: &str) -> Option<&'static MediaFormat> {
    let normalized = match content_type {
        "image/jpg" => "image/jpeg",
        other => other,
    };
    IMAGE_FORMATS.iter().find(|f| f.content_type == normalized)
}

/// Resolve an audio format from a file extension (e.g. `flac`).
pub fn audio_format_for_extension(extension: &str) -> Option<&'static MediaFormat> {
    let name = match extension {
        "oga" => "ogg",
        "m4a" => "aac",
        other => other,
    };
    lookup_audio(name)
}
