//! Audio transcoding routine
//!
//! Delegates codec work to the system `ffmpeg` binary: input bytes go to a
//! fresh temp file carrying the source extension, ffmpeg writes the output
//! container, and the invocation is awaited without blocking the runtime.
//! From the engine's perspective the whole exchange is one call that either
//! returns transformed bytes or an error; temp files are scratch space of
//! the invocation and vanish with it.

use std::path::Path;
use std::process::Stdio;

use tokio::process::Command;

use crate::constants::DEFAULT_AUDIO_BITRATE;
use crate::directives::TransformDirectives;
use crate::error::EngineError;
use crate::formats::{self, MediaFormat};
use crate::storage::StoredObject;

/// Transcode one audio object. Returns the output bytes and their
/// content type.
pub async fn transcode(
    object: &StoredObject,
    original_path: &str,
    directives: &TransformDirectives,
) -> Result<(Vec<u8>, String), EngineError> {
    let source_extension = extension_of(original_path).unwrap_or("bin");
    let target = directives
        .format
        .as_deref()
        .and_then(formats::lookup_audio);

    // Absent target format: the output container mirrors the input.
    let output_extension = target.map(|f| f.name).unwrap_or(source_extension);
    let bitrate = effective_bitrate(target, source_extension, directives);

    let workdir = tempfile::tempdir()
        .map_err(|e| EngineError::AudioTransformFailed(format!("temp dir: {e}")))?;
    let input_path = workdir.path().join(format!("input.{source_extension}"));
    let output_path = workdir.path().join(format!("output.{output_extension}"));

    tokio::fs::write(&input_path, &object.body)
        .await
        .map_err(|e| EngineError::AudioTransformFailed(format!("write temp input: {e}")))?;

    let mut command = Command::new("ffmpeg");
    command
        .arg("-y")
        .args(["-loglevel", "error"])
        .arg("-i")
        .arg(&input_path)
        .arg("-vn")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped());

    if let Some(format) = target {
        command.args(["-acodec", format.encoder]);
    }
    if let Some(ref bitrate) = bitrate {
        command.args(["-b:a", bitrate]);
    }
    command.arg(&output_path);

    let output = command.output().await.map_err(|e| {
        EngineError::AudioTransformFailed(format!(
            "failed to invoke ffmpeg (is it installed and on PATH?): {e}"
        ))
    })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(EngineError::AudioTransformFailed(format!(
            "ffmpeg exited with {}: {}",
            output.status,
            stderr.trim()
        )));
    }

    let transcoded = tokio::fs::read(&output_path)
        .await
        .map_err(|e| EngineError::AudioTransformFailed(format!("read temp output: {e}")))?;

    let content_type = match target {
        Some(format) => format.content_type.to_string(),
        None => object
            .content_type
            .clone()
            .or_else(|| {
                formats::audio_format_for_extension(source_extension)
                    .map(|f| f.content_type.to_string())
            })
            .unwrap_or_else(|| "application/octet-stream".to_string()),
    };

    Ok((transcoded, content_type))
}

/// Bitrate rules:
/// - target resolved and supports bitrate: explicit directive or the fixed
///   default;
/// - target resolved without bitrate support: no flag at all;
/// - no target resolved: the same two rules against the source extension's
///   registry entry.
fn effective_bitrate(
    target: Option<&'static MediaFormat>,
    source_extension: &str,
    directives: &TransformDirectives,
) -> Option<String> {
    let format = target.or_else(|| formats::audio_format_for_extension(source_extension))?;
    if !format.supports_bitrate {
        return None;
    }
    Some(
        directives
            .bitrate
            .clone()
            .unwrap_or_else(|| DEFAULT_AUDIO_BITRATE.to_string()),
    )
}

fn extension_of(path: &str) -> Option<&str> {
    Path::new(path).extension().and_then(|e| e.to_str())
}

/// Startup probe: whether the transcoding engine is reachable on PATH.
pub fn is_ffmpeg_on_path() -> bool {
    std::process::Command::new("ffmpeg")
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}
