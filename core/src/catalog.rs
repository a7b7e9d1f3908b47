//! Read-only configuration: the pair list, the token list and the selected
//! base currency. Loaded once from JSON and shared by every query.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{PairConfig, PairId, TokenConfig, TokenId};

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("failed to read catalog {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid catalog json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("pair {pair} references unknown token {token}")]
    UnknownToken { pair: PairId, token: TokenId },

    #[error("base currency {0} is not a configured token")]
    UnknownBase(TokenId),
}

/// Display metadata for an exchange, keyed by the id used in pair configs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DexInfo {
    pub name: String,

    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    pub pairs: Vec<PairConfig>,
    pub tokens: Vec<TokenConfig>,

    #[serde(rename = "baseCurrency", alias = "base_currency")]
    pub base_currency: TokenId,

    /// Token that upstream 24h volumes are denominated in.
    #[serde(default, rename = "volumeToken", alias = "volume_token")]
    pub volume_token: TokenId,

    #[serde(default)]
    pub dexes: HashMap<String, DexInfo>,
}

impl Catalog {
    pub fn new(pairs: Vec<PairConfig>, tokens: Vec<TokenConfig>, base_currency: TokenId) -> Self {
        Self {
            pairs,
            tokens,
            base_currency,
            volume_token: 0,
            dexes: HashMap::new(),
        }
    }

    pub fn from_json_str(raw: &str) -> Result<Self, CatalogError> {
        let catalog: Catalog = serde_json::from_str(raw)?;
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    /// Every pair endpoint and the base currency must name a configured token.
    pub fn validate(&self) -> Result<(), CatalogError> {
        let known = self.tokens.len() as TokenId;
        for (idx, pair) in self.pairs.iter().enumerate() {
            for &token in &pair.tokens {
                if token >= known {
                    return Err(CatalogError::UnknownToken {
                        pair: idx as PairId,
                        token,
                    });
                }
            }
        }
        if self.base_currency >= known {
            return Err(CatalogError::UnknownBase(self.base_currency));
        }
        Ok(())
    }

    pub fn token(&self, id: TokenId) -> Option<&TokenConfig> {
        self.tokens.get(id as usize)
    }

    pub fn pair(&self, id: PairId) -> Option<&PairConfig> {
        self.pairs.get(id as usize)
    }

    pub fn token_by_symbol(&self, symbol: &str) -> Option<(TokenId, &TokenConfig)> {
        self.tokens
            .iter()
            .enumerate()
            .find(|(_, t)| t.symbol == symbol)
            .map(|(idx, t)| (idx as TokenId, t))
    }

    pub fn dex(&self, id: &str) -> Option<&DexInfo> {
        self.dexes.get(id)
    }
}
