use crate::SkeletonFormat;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("no {format} skeleton file was provided")]
    MissingSkeletonFile { format: SkeletonFormat },

    #[error("no atlas file was provided")]
    MissingAtlasFile,

    #[error("binary skeletons are not supported by this build or runtime")]
    BinaryUnsupported,

    #[error("{format} skeleton support is not enabled in this build")]
    FormatDisabled { format: SkeletonFormat },

    #[error("atlas references texture pages that were not provided: {}", pages.join(", "))]
    MissingTexturePages { pages: Vec<String> },

    #[error("failed to read '{name}': {message}")]
    ReadFile { name: String, message: String },

    #[error("asset pipeline failed to load '{key}': {message}")]
    AssetPipeline { key: String, message: String },

    #[error("failed to create skeleton instance '{key}': {message}")]
    Spawn { key: String, message: String },

    #[error("unknown animation: {name}")]
    UnknownAnimation { name: String },

    #[error("unknown skin: {name}")]
    UnknownSkin { name: String },

    #[error("load cycle {generation} was superseded by a newer load")]
    Superseded { generation: u64 },

    #[error("invalid configuration: {message}")]
    Config { message: String },

    #[cfg(feature = "json")]
    #[error("failed to parse Spine JSON: {message}")]
    JsonParse { message: String },

    #[cfg(feature = "json")]
    #[error("unsupported or invalid Spine version string: {value}")]
    JsonSpineVersion { value: String },

    #[cfg(feature = "json")]
    #[error("unknown parent bone '{parent}' for bone '{bone}'")]
    JsonUnknownBoneParent { bone: String, parent: String },

    #[cfg(feature = "json")]
    #[error("unknown bone '{bone}' referenced by slot '{slot}'")]
    JsonUnknownSlotBone { slot: String, bone: String },

    #[cfg(feature = "json")]
    #[error("unknown slot '{slot}' referenced by skin '{skin}'")]
    JsonUnknownSkinSlot { skin: String, slot: String },

    #[cfg(feature = "json")]
    #[error(
        "unsupported attachment type '{attachment_type}' for skin '{skin}', slot '{slot}', attachment '{attachment}'"
    )]
    JsonUnsupportedAttachmentType {
        skin: String,
        slot: String,
        attachment: String,
        attachment_type: String,
    },

    #[cfg(feature = "json")]
    #[error("unknown {kind} '{name}' referenced by animation '{animation}'")]
    JsonUnknownAnimationTarget {
        animation: String,
        kind: &'static str,
        name: String,
    },

    #[cfg(feature = "json")]
    #[error("unknown event '{event}' referenced by animation '{animation}'")]
    JsonUnknownEvent { animation: String, event: String },

    #[cfg(feature = "binary")]
    #[error("failed to parse Spine binary: {message}")]
    BinaryParse { message: String },

    #[cfg(feature = "binary")]
    #[error("unsupported or invalid Spine version string: {value}")]
    BinarySpineVersion { value: String },
}

impl From<crate::PipelineError> for Error {
    fn from(err: crate::PipelineError) -> Self {
        Self::AssetPipeline {
            key: err.key,
            message: err.message,
        }
    }
}
