//! Core type definitions for uploaded images.
//!
//! The image kind determines dimension bounds during transcoding and whether
//! an image is a prune candidate. Kinds are serialized in lowercase on the
//! wire and in the database.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of uploaded image, as declared at session init.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageKind {
    /// Image attached to a post.
    Post,
    /// User profile (avatar) image.
    Profile,
    /// Profile header/banner image.
    Header,
    /// Image attached to a comment.
    Comment,
}

impl fmt::Display for ImageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Post => write!(f, "post"),
            Self::Profile => write!(f, "profile"),
            Self::Header => write!(f, "header"),
            Self::Comment => write!(f, "comment"),
        }
    }
}

impl std::str::FromStr for ImageKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "post" => Ok(Self::Post),
            "profile" => Ok(Self::Profile),
            "header" => Ok(Self::Header),
            "comment" => Ok(Self::Comment),
            other => Err(format!("unknown image kind: {}", other)),
        }
    }
}
