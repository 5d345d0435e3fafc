//! The load/unload error-code taxonomy (spec §6).

use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum LoaderError {
    #[error("can't find the library file")]
    NoLibrary,
    #[error("file already loaded under a different prefix")]
    SplitPersonality,
    #[error("a statically registered library can't be unloaded through the dynamic path")]
    NotStatic,
    #[error("can't determine library prefix from the file name")]
    WhatLibrary,
    #[error("library has no safe-init entrypoint")]
    Unsafe,
    #[error("library has no init entrypoint")]
    Entrypoint,
    #[error("library was never loaded into this interpreter")]
    NeverLoaded,
    #[error("a statically registered library can never be unloaded")]
    Static,
    #[error("library has no unload entrypoint")]
    Cannot,
    #[error("safe interpreter has no safe-unload entrypoint")]
    Disabled,
}

impl LoaderError {
    pub fn tag(self) -> &'static str {
        match self {
            LoaderError::NoLibrary => "NOLIBRARY",
            LoaderError::SplitPersonality => "SPLITPERSONALITY",
            LoaderError::NotStatic => "NOTSTATIC",
            LoaderError::WhatLibrary => "WHATLIBRARY",
            LoaderError::Unsafe => "UNSAFE",
            LoaderError::Entrypoint => "ENTRYPOINT",
            LoaderError::NeverLoaded => "NEVERLOADED",
            LoaderError::Static => "STATIC",
            LoaderError::Cannot => "CANNOT",
            LoaderError::Disabled => "DISABLED",
        }
    }
}
