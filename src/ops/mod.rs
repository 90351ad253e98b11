//! The document transforms.
//!
//! Each one is a blocking function over validated input that reports
//! progress as it goes; the server runs them on the blocking thread pool.

pub mod compress;
pub mod images;
pub mod merge;
pub mod protect;
pub mod split;

pub use compress::{compress, CompressOutcome, CompressSettings, CompressionEngine};
pub use images::{convert_to_images, FailedPage, ImageFormat, ImageSettings, ImagesOutcome};
pub use merge::{merge, MergeOutcome};
pub use protect::{
    protect, FailedAttempt, ProtectOutcome, ProtectSettings, ProtectionGuarantee,
    ProtectionStrategy,
};
pub use split::{split, PageSelection, SplitOutcome};
