//! Symbol normalization: venue pair string -> canonical fan token symbol.
//!
//! The table is built once at startup and passed explicitly to every adapter,
//! so normalization stays pure and independently testable. Unknown pairs are
//! never an error: `normalize` returns `None` and logs once per unseen pair
//! so new listings can be added without restarting ingestion.

use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};

use crate::models::Venue;

/// The fixed universe of tracked fan token symbols (plus CHZ itself).
pub const TRACKED_TOKENS: &[&str] = &[
    "CHZ",
    // La Liga
    "BAR", "ATM", "VCF", "SEVILLA",
    // Serie A
    "JUV", "ACM", "ASR", "LAZIO", "INTER", "NAP", "UDI",
    // Premier League
    "CITY", "AFC", "SPURS", "EFC", "AVL",
    // Ligue 1
    "PSG", "ASM",
    // Primeira Liga
    "PORTO", "BENFICA",
    // Super Lig
    "GAL", "TRA", "GOZ", "SAM", "ALA", "IBFK", "BJK", "FB",
    // Brasileirao
    "SANTOS", "MENGO", "FLU", "SCCP", "SPFC", "GALO", "VERDAO", "VASCO",
    "BAHIA", "SACI",
    // Argentina
    "ARG", "CAI",
    // Other leagues
    "LEG", "TIGRES", "YBO", "STV",
    // National teams
    "POR", "ITA", "VATRENI", "SNFT", "BFT",
    // Formula 1
    "ALPINE", "SAUBER", "AM",
    // Fighting
    "UFC", "PFL",
    // Esports
    "OG", "NAVI", "ALL", "TH", "DOJO",
    // Individual
    "MODRIC",
];

/// Quote currencies seen across the tracked venues, longest suffix first so
/// USDT is tried before USD.
const QUOTE_SUFFIXES: &[(&str, Quote)] = &[
    ("USDT", Quote::Usdt),
    ("USDC", Quote::Usdc),
    ("BUSD", Quote::Busd),
    ("USD", Quote::Usd),
    ("KRW", Quote::Krw),
    ("BRL", Quote::Brl),
    ("EUR", Quote::Eur),
    ("TRY", Quote::Try),
    ("BTC", Quote::Btc),
];

/// Odd venue spellings that don't reduce to a tracked symbol by suffix
/// stripping alone (e.g. Binance lists Atletico Madrid as ATMAUSDT).
const BASE_ALIASES: &[(&str, &str)] = &[("ATMA", "ATM")];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quote {
    Usd,
    Usdt,
    Usdc,
    Busd,
    Krw,
    Brl,
    Eur,
    Try,
    Btc,
    Unknown,
}

impl Quote {
    /// Stablecoins and USD itself need no conversion.
    pub fn is_usd_equivalent(&self) -> bool {
        matches!(self, Quote::Usd | Quote::Usdt | Quote::Usdc | Quote::Busd)
    }
}

pub struct SymbolTable {
    tokens: HashSet<&'static str>,
    aliases: HashMap<&'static str, &'static str>,
    /// Pairs already logged as unresolved, so each unseen spelling is
    /// reported exactly once per process lifetime.
    logged_unseen: Mutex<HashSet<String>>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self {
            tokens: TRACKED_TOKENS.iter().copied().collect(),
            aliases: BASE_ALIASES.iter().copied().collect(),
            logged_unseen: Mutex::new(HashSet::new()),
        }
    }

    /// Map a venue-native pair string to a canonical token symbol.
    ///
    /// Handles case variants, `-`/`_`/`/` separators, quote suffixes
    /// (CHZUSDT, CHZ-EUR, chz_usdt) and quote-prefixed codes (Upbit's
    /// KRW-CHZ). Returns `None` for anything outside the tracked universe.
    pub fn normalize(&self, venue: Venue, raw_pair: &str) -> Option<&'static str> {
        let canon = canonical_form(raw_pair);

        if let Some(token) = self.lookup_base(&canon) {
            return Some(token);
        }

        // Suffix-quoted: CHZUSDT, BARKRW, ...
        for (suffix, _) in QUOTE_SUFFIXES {
            if let Some(base) = canon.strip_suffix(suffix) {
                if let Some(token) = self.lookup_base(base) {
                    return Some(token);
                }
            }
        }

        // Prefix-quoted: Upbit codes like KRWCHZ (from KRW-CHZ).
        for (prefix, _) in QUOTE_SUFFIXES {
            if let Some(base) = canon.strip_prefix(prefix) {
                if let Some(token) = self.lookup_base(base) {
                    return Some(token);
                }
            }
        }

        let mut logged = self.logged_unseen.lock();
        if logged.insert(canon) {
            tracing::warn!(
                venue = %venue,
                pair = %raw_pair,
                "unmapped trading pair, emitting as unresolved"
            );
        }
        None
    }

    /// Quote currency of a pair, used for USD conversion of the notional.
    pub fn quote(&self, raw_pair: &str) -> Quote {
        let canon = canonical_form(raw_pair);
        for (suffix, quote) in QUOTE_SUFFIXES {
            if canon.ends_with(suffix) && canon.len() > suffix.len() {
                return *quote;
            }
        }
        // Prefix-quoted codes (Upbit).
        for (prefix, quote) in QUOTE_SUFFIXES {
            if canon.starts_with(prefix) && canon.len() > prefix.len() {
                return *quote;
            }
        }
        Quote::Unknown
    }

    fn lookup_base(&self, base: &str) -> Option<&'static str> {
        if let Some(token) = self.tokens.get(base) {
            return Some(token);
        }
        self.aliases.get(base).copied()
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

fn canonical_form(raw_pair: &str) -> String {
    raw_pair
        .trim()
        .to_ascii_uppercase()
        .replace(['-', '_', '/'], "")
}
