//! Password protection with an ordered fallback chain.
//!
//! Each [`ProtectionStrategy`] declares the [`ProtectionGuarantee`] it
//! provides. Strategies weaker than the requested minimum are never tried;
//! the first one that works wins and the result says which it was.

use crate::error::{Error, Result};
use crate::pdf::{stamp_text, EncryptionLevel, Permissions, QpdfWrapper};
use crate::pipeline::{output_file_name, OutputFile, OutputKind, ProgressTracker, ValidatedPdf};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Text stamped by the watermark strategy
pub const WATERMARK_TEXT: &str = "PROTECTED";

/// What a protected output actually guarantees, weakest first
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum ProtectionGuarantee {
    /// Anything goes, even output that is not protected at all
    None,
    /// Visibly marked, but anyone can open and edit it
    Cosmetic,
    /// Needs a password to open
    #[default]
    Encrypted,
}

impl fmt::Display for ProtectionGuarantee {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ProtectionGuarantee::None => "none",
            ProtectionGuarantee::Cosmetic => "cosmetic",
            ProtectionGuarantee::Encrypted => "encrypted",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ProtectionStrategy {
    /// AES-256 encryption (revision 6)
    Aes256,
    /// AES-128 encryption (revision 4)
    Aes128,
    /// Diagonal "PROTECTED" stamp on every page
    Watermark,
}

impl ProtectionStrategy {
    pub fn guarantee(&self) -> ProtectionGuarantee {
        match self {
            ProtectionStrategy::Aes256 | ProtectionStrategy::Aes128 => {
                ProtectionGuarantee::Encrypted
            }
            ProtectionStrategy::Watermark => ProtectionGuarantee::Cosmetic,
        }
    }
}

impl fmt::Display for ProtectionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ProtectionStrategy::Aes256 => "aes256",
            ProtectionStrategy::Aes128 => "aes128",
            ProtectionStrategy::Watermark => "watermark",
        })
    }
}

/// Tried in this order when the caller gives no list
pub const DEFAULT_STRATEGIES: [ProtectionStrategy; 3] = [
    ProtectionStrategy::Aes256,
    ProtectionStrategy::Aes128,
    ProtectionStrategy::Watermark,
];

#[derive(Debug, Clone)]
pub struct ProtectSettings {
    pub owner_password: String,
    /// Falls back to the owner password when absent or empty
    pub user_password: Option<String>,
    pub permissions: Permissions,
    pub minimum: ProtectionGuarantee,
    /// Empty means [`DEFAULT_STRATEGIES`]
    pub strategies: Vec<ProtectionStrategy>,
}

impl ProtectSettings {
    pub fn new(owner_password: impl Into<String>) -> Self {
        Self {
            owner_password: owner_password.into(),
            user_password: None,
            permissions: Permissions::default(),
            minimum: ProtectionGuarantee::default(),
            strategies: Vec::new(),
        }
    }

    fn effective_user_password(&self) -> Option<&str> {
        self.user_password.as_deref().filter(|p| !p.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, JsonSchema)]
pub struct FailedAttempt {
    pub strategy: ProtectionStrategy,
    pub error: String,
}

#[derive(Debug)]
pub struct ProtectOutcome {
    pub output: OutputFile,
    pub strategy: ProtectionStrategy,
    pub guarantee: ProtectionGuarantee,
    /// Strategies tried before the one that worked
    pub attempts: Vec<FailedAttempt>,
    /// Informational messages; never errors
    pub notices: Vec<String>,
}

/// The strategies to try, in order, and the ones left out for being too weak
fn plan(
    requested: &[ProtectionStrategy],
    minimum: ProtectionGuarantee,
) -> (Vec<ProtectionStrategy>, Vec<ProtectionStrategy>) {
    let requested = if requested.is_empty() {
        &DEFAULT_STRATEGIES[..]
    } else {
        requested
    };

    requested
        .iter()
        .copied()
        .partition(|strategy| strategy.guarantee() >= minimum)
}

/// Try `chain` in order until `apply` succeeds
fn run_chain<F>(
    chain: &[ProtectionStrategy],
    minimum: ProtectionGuarantee,
    progress: &mut ProgressTracker,
    mut apply: F,
) -> Result<(ProtectionStrategy, Vec<u8>, Vec<FailedAttempt>)>
where
    F: FnMut(ProtectionStrategy) -> Result<Vec<u8>>,
{
    progress.start(chain.len());
    let mut attempts = Vec::new();

    for (i, &strategy) in chain.iter().enumerate() {
        match apply(strategy) {
            Ok(data) => {
                progress.finish();
                return Ok((strategy, data, attempts));
            }
            Err(e) => {
                tracing::warn!(strategy = %strategy, error = %e, "protection strategy failed");
                progress.fail_unit(i, &e.to_string());
                attempts.push(FailedAttempt {
                    strategy,
                    error: e.client_message(),
                });
            }
        }
    }

    Err(Error::ProtectionUnavailable {
        minimum: minimum.to_string(),
        attempts: attempts.len(),
    })
}

/// Reopen an encrypted output: it must refuse to open without a password
/// and open with the user password to the same number of pages
fn verify_encrypted(data: &[u8], user_password: &str, expected_pages: u32) -> Result<()> {
    match QpdfWrapper::page_count(data, None) {
        Err(Error::PasswordRequired) => {}
        Ok(_) => {
            return Err(Error::QpdfError {
                reason: "output opens without a password".to_string(),
            })
        }
        Err(e) => return Err(e),
    }

    let pages = QpdfWrapper::page_count(data, Some(user_password))?;
    if pages != expected_pages {
        return Err(Error::QpdfError {
            reason: format!(
                "output has {} pages after encryption, expected {}",
                pages, expected_pages
            ),
        });
    }
    Ok(())
}

pub fn protect(
    pdf: &ValidatedPdf,
    settings: &ProtectSettings,
    source_password: Option<&str>,
    progress: &mut ProgressTracker,
) -> Result<ProtectOutcome> {
    if settings.owner_password.is_empty() {
        return Err(Error::InvalidParameter {
            reason: "owner_password must not be empty".to_string(),
        });
    }

    let mut notices = Vec::new();
    let owner = settings.owner_password.as_str();
    let user_defaulted = settings.effective_user_password().is_none();
    let user = settings.effective_user_password().unwrap_or(owner);

    let (chain, excluded) = plan(&settings.strategies, settings.minimum);
    for strategy in &excluded {
        notices.push(format!(
            "Strategy '{}' skipped: it only provides '{}' protection, below the required '{}'.",
            strategy,
            strategy.guarantee(),
            settings.minimum
        ));
    }

    let (strategy, data, attempts) =
        run_chain(&chain, settings.minimum, progress, |strategy| match strategy {
            ProtectionStrategy::Aes256 | ProtectionStrategy::Aes128 => {
                let level = if strategy == ProtectionStrategy::Aes256 {
                    EncryptionLevel::Aes256
                } else {
                    EncryptionLevel::Aes128
                };
                let data = QpdfWrapper::encrypt(
                    pdf.data(),
                    level,
                    user,
                    owner,
                    &settings.permissions,
                    source_password,
                )?;
                verify_encrypted(&data, user, pdf.page_count)?;
                Ok(data)
            }
            ProtectionStrategy::Watermark => {
                let plain = match source_password {
                    Some(_) => QpdfWrapper::decrypt(pdf.data(), source_password)?,
                    None => pdf.data().to_vec(),
                };
                stamp_text(&plain, WATERMARK_TEXT)
            }
        })?;

    let guarantee = strategy.guarantee();
    if guarantee == ProtectionGuarantee::Encrypted && user_defaulted {
        notices.push(
            "No user password given; the owner password is needed to open the document."
                .to_string(),
        );
    }
    if guarantee == ProtectionGuarantee::Encrypted && !settings.permissions.accessibility {
        notices.push(
            "Accessibility cannot be restricted with AES encryption; it stays allowed."
                .to_string(),
        );
    }
    if guarantee < ProtectionGuarantee::Encrypted {
        notices.push(format!(
            "Protected with '{}': the document is marked but not encrypted, passwords and permissions were not applied.",
            strategy
        ));
    }
    if !attempts.is_empty() {
        notices.push(format!(
            "Fell back to '{}' after {} failed attempt(s).",
            strategy,
            attempts.len()
        ));
    }

    tracing::info!(name = %pdf.name(), strategy = %strategy, guarantee = %guarantee, "protected");

    Ok(ProtectOutcome {
        output: OutputFile::pdf(output_file_name(pdf.name(), "protected", OutputKind::Pdf), data),
        strategy,
        guarantee,
        attempts,
        notices,
    })
}
