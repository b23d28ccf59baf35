//! The flat-file cache of the payment ledger, `mnpayments.dat`.
//!
//! Layout: a length-prefixed magic message, the 4 network magic bytes, the
//! serialized ledger, and a trailing double-SHA256 over everything before
//! it. The file is advisory; on any damage it is discarded and the ledger
//! is rebuilt from peer sync.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Instant;

use log::{error, info};

use ingot_crypto::hash::sha256d;

use crate::config::PaymentsConfig;
use crate::error::PaymentError;
use crate::ledger::LedgerSnapshot;
use crate::manager::MasternodePayments;

/// Magic message identifying a payments cache file.
const PAYMENTS_CACHE_MAGIC: &str = "MasternodePayments";

/// File name of the payments cache inside the data directory.
const PAYMENTS_CACHE_FILENAME: &str = "mnpayments.dat";

/// Outcome of reading the cache file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadResult {
    Ok,
    /// File missing or unreadable.
    FileError,
    /// File too short to carry the integrity trailer.
    HashReadError,
    IncorrectHash,
    IncorrectMagicMessage,
    IncorrectMagicNumber,
    IncorrectFormat,
}

pub struct PaymentsDb {
    path: PathBuf,
    magic_message: String,
    network_magic: [u8; 4],
}

impl PaymentsDb {
    pub fn new(path: impl AsRef<Path>, network_magic: [u8; 4]) -> Self {
        PaymentsDb {
            path: path.as_ref().to_path_buf(),
            magic_message: PAYMENTS_CACHE_MAGIC.to_string(),
            network_magic,
        }
    }

    /// The cache for `config`: `mnpayments.dat` inside its data directory,
    /// stamped with its network magic.
    pub fn from_config(config: &PaymentsConfig) -> Self {
        Self::new(config.data_dir.join(PAYMENTS_CACHE_FILENAME), config.network_magic)
    }

    /// Serializes the ledger and writes it out with the integrity trailer.
    pub fn write(&self, payments: &MasternodePayments) -> Result<(), PaymentError> {
        let start = Instant::now();

        let mut data = bincode::serialize(&self.magic_message)?;
        data.extend_from_slice(&self.network_magic);
        data.extend(bincode::serialize(&payments.ledger().snapshot())?);
        let hash = sha256d(&data);
        data.extend_from_slice(&hash);

        fs::write(&self.path, data)?;

        info!(
            "written info to {} {}ms",
            self.path.display(),
            start.elapsed().as_millis()
        );
        Ok(())
    }

    fn read_snapshot(&self) -> (ReadResult, Option<LedgerSnapshot>) {
        let data = match fs::read(&self.path) {
            Ok(data) => data,
            Err(err) => {
                error!("failed to open {}: {}", self.path.display(), err);
                return (ReadResult::FileError, None);
            }
        };

        if data.len() < 32 {
            error!("{} is too short to carry a checksum", self.path.display());
            return (ReadResult::HashReadError, None);
        }
        let (body, hash_in) = data.split_at(data.len() - 32);

        if sha256d(body) != hash_in {
            error!("checksum mismatch in {}, data corrupted", self.path.display());
            return (ReadResult::IncorrectHash, None);
        }

        let mut cursor = std::io::Cursor::new(body);

        let magic_message: String = match bincode::deserialize_from(&mut cursor) {
            Ok(message) => message,
            Err(err) => {
                error!("failed to parse {}: {}", self.path.display(), err);
                return (ReadResult::IncorrectFormat, None);
            }
        };
        if magic_message != self.magic_message {
            error!("invalid payments cache magic message in {}", self.path.display());
            return (ReadResult::IncorrectMagicMessage, None);
        }

        let mut magic = [0u8; 4];
        if cursor.read_exact(&mut magic).is_err() {
            return (ReadResult::IncorrectFormat, None);
        }
        if magic != self.network_magic {
            error!("invalid network magic number in {}", self.path.display());
            return (ReadResult::IncorrectMagicNumber, None);
        }

        match bincode::deserialize_from(&mut cursor) {
            Ok(snapshot) => (ReadResult::Ok, Some(snapshot)),
            Err(err) => {
                error!("failed to parse {}: {}", self.path.display(), err);
                (ReadResult::IncorrectFormat, None)
            }
        }
    }

    /// Loads the cache into the ledger. `dry_run` skips the post-load
    /// pruning pass, for format verification only.
    pub fn read(&self, payments: &MasternodePayments, dry_run: bool) -> ReadResult {
        let start = Instant::now();

        let (result, snapshot) = self.read_snapshot();
        let snapshot = match snapshot {
            Some(snapshot) => snapshot,
            None => {
                if result == ReadResult::IncorrectFormat {
                    payments.ledger().clear();
                }
                return result;
            }
        };

        payments.ledger().load(snapshot);
        info!(
            "loaded info from {} {}ms",
            self.path.display(),
            start.elapsed().as_millis()
        );
        info!("  {}", payments.summary());

        if !dry_run {
            info!("masternode payments manager - cleaning....");
            payments.clean_payment_list();
            info!("masternode payments manager - result: {}", payments.summary());
        }

        ReadResult::Ok
    }

    /// Verifies the on-disk format, then rewrites the file from the
    /// current ledger. Refuses to overwrite a file it cannot classify.
    pub fn dump(&self, payments: &MasternodePayments) -> Result<(), PaymentError> {
        let start = Instant::now();

        info!("verifying {} format...", self.path.display());
        let (read_result, _) = self.read_snapshot();
        match read_result {
            ReadResult::Ok => {}
            ReadResult::FileError => {
                info!(
                    "missing payments cache file - {}, will try to recreate",
                    self.path.display()
                );
            }
            ReadResult::IncorrectFormat => {
                error!(
                    "error reading {}: magic is ok but data has invalid format, will try to recreate",
                    self.path.display()
                );
            }
            _ => {
                error!(
                    "error reading {}: file format is unknown or invalid, please fix it manually",
                    self.path.display()
                );
                return Err(PaymentError::Cache(
                    "refusing to overwrite unrecognized payments cache".to_string(),
                ));
            }
        }

        info!("writing info to {}...", self.path.display());
        self.write(payments)?;
        info!("payments dump finished {}ms", start.elapsed().as_millis());
        Ok(())
    }
}
