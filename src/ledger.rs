//! Last-notified price per (date, shape), and its on-disk form.
//!
//! File shape:
//! ```json
//! { "direct": { "20250601": 1200 }, "non_direct": { "20250601": 860 } }
//! ```
//! The old combined `config.json` keys (`lastDirectPrices`,
//! `lastNonDirectPrices`) are read as well, so an existing file can be
//! pointed at directly.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use metrics::counter;
use serde::{Deserialize, Serialize};
use tokio::{fs, io::AsyncWriteExt};

use crate::fare::{Price, Shape, WatchDate};
use crate::{AlertError, Result};

/// Stored value meaning "never notified". No real fare is zero.
pub const NEVER_NOTIFIED: Price = 0;

pub const DEFAULT_LEDGER_PATH: &str = "state/ledger.json";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ledger {
    #[serde(default, alias = "lastDirectPrices")]
    direct: BTreeMap<WatchDate, Price>,
    #[serde(default, alias = "lastNonDirectPrices")]
    non_direct: BTreeMap<WatchDate, Price>,
}

impl Ledger {
    fn side(&self, shape: Shape) -> &BTreeMap<WatchDate, Price> {
        match shape {
            Shape::Direct => &self.direct,
            Shape::NonDirect => &self.non_direct,
        }
    }

    fn side_mut(&mut self, shape: Shape) -> &mut BTreeMap<WatchDate, Price> {
        match shape {
            Shape::Direct => &mut self.direct,
            Shape::NonDirect => &mut self.non_direct,
        }
    }

    /// Last notified price, or [`NEVER_NOTIFIED`].
    pub fn last(&self, date: &WatchDate, shape: Shape) -> Price {
        self.side(shape)
            .get(date)
            .copied()
            .unwrap_or(NEVER_NOTIFIED)
    }

    pub fn record(&mut self, date: &WatchDate, shape: Shape, price: Price) {
        self.side_mut(shape).insert(date.clone(), price);
    }

    pub fn len(&self) -> usize {
        self.direct.len() + self.non_direct.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// JSON file holding the ledger between runs.
#[derive(Debug, Clone)]
pub struct LedgerStore {
    path: PathBuf,
}

impl LedgerStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `ConfigMissing` when nothing was saved yet, `ConfigCorrupt` when the
    /// file exists but cannot be read back.
    pub async fn load(&self) -> Result<Ledger> {
        let raw = match fs::read_to_string(&self.path).await {
            Ok(s) => s,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(AlertError::ConfigMissing {
                    path: self.path.clone(),
                })
            }
            Err(e) => return Err(AlertError::corrupt(&self.path, e)),
        };
        serde_json::from_str(&raw).map_err(|e| AlertError::corrupt(&self.path, e))
    }

    /// First run starts from an empty ledger. Corruption still fails.
    pub async fn load_or_empty(&self) -> Result<Ledger> {
        match self.load().await {
            Ok(l) => Ok(l),
            Err(AlertError::ConfigMissing { path }) => {
                tracing::info!(path = %path.display(), "no ledger yet, starting empty");
                Ok(Ledger::default())
            }
            Err(e) => Err(e),
        }
    }

    /// Write to a sibling temp file, fsync, then rename over the target.
    pub async fn save(&self, ledger: &Ledger) -> Result<()> {
        let res = self.write_atomic(ledger).await;
        match &res {
            Ok(()) => counter!("fare_ledger_writes_total").increment(1),
            Err(_) => counter!("fare_ledger_write_errors_total").increment(1),
        }
        res.map_err(|source| AlertError::LedgerWriteFailure {
            path: self.path.clone(),
            source,
        })
    }

    async fn write_atomic(&self, ledger: &Ledger) -> std::io::Result<()> {
        if let Some(dir) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(dir).await?;
        }
        let json = serde_json::to_vec_pretty(ledger)
            .map_err(|e| std::io::Error::new(ErrorKind::InvalidData, e))?;

        let tmp = self.path.with_extension("json.tmp");
        let mut f = fs::File::create(&tmp).await?;
        f.write_all(&json).await?;
        f.sync_all().await?;
        drop(f);
        fs::rename(&tmp, &self.path).await
    }
}
