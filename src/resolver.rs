use serde::Serialize;

use crate::identifier;
use crate::support_db::{SupportDatabase, DETAIL_UNKNOWN, DRIVER_NONE};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchKind {
    Exact,
    Fuzzy,
    Wildcard,
    None,
}

impl MatchKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MatchKind::Exact => "exact",
            MatchKind::Fuzzy => "fuzzy",
            MatchKind::Wildcard => "wildcard",
            MatchKind::None => "none",
        }
    }
}

/// Outcome of one resolution. `status` is the raw stored value (`"0"`/`"1"`
/// or anything else the file carried); `matched_key` is the database key that
/// actually hit, which differs from the query on fuzzy/wildcard matches.
#[derive(Clone, Debug, Serialize)]
pub struct MatchResult {
    pub status: Option<String>,
    pub matched_key: Option<String>,
    pub detail: String,
    pub driver: String,
    pub kind: MatchKind,
}

impl MatchResult {
    pub fn no_match() -> Self {
        MatchResult {
            status: None,
            matched_key: None,
            detail: DETAIL_UNKNOWN.to_string(),
            driver: DRIVER_NONE.to_string(),
            kind: MatchKind::None,
        }
    }
}

fn hit(db: &SupportDatabase, key: &str, kind: MatchKind) -> MatchResult {
    match db.lookup_exact(key) {
        Some(rec) => MatchResult {
            status: rec.status,
            matched_key: Some(rec.key),
            detail: rec.detail,
            driver: rec.driver,
            kind,
        },
        None => MatchResult::no_match(),
    }
}

/// Tiered lookup for bus-ID-keyed hardware (GPU/audio/network): exact
/// `VVVV&DDDD`, then `VVVV&DDFF` with the device low byte wildcarded, then
/// the vendor-wide `VVVV&FFFF`. The first tier whose key carries a status
/// wins. An empty or malformed query never touches the database.
pub fn resolve_id(db: &SupportDatabase, query: &str) -> MatchResult {
    let query = query.trim();
    if !identifier::is_valid_text(query) {
        return MatchResult::no_match();
    }
    let canon = query.to_uppercase();
    let Some((vendor, device)) = canon.split_once('&') else {
        return MatchResult::no_match();
    };
    let fuzzy = format!("{}&{}FF", vendor, &device[..2]);
    let wildcard = format!("{}&FFFF", vendor);
    let tiers = [
        (canon.as_str(), MatchKind::Exact),
        (fuzzy.as_str(), MatchKind::Fuzzy),
        (wildcard.as_str(), MatchKind::Wildcard),
    ];
    for (key, kind) in tiers {
        if db.status_of(key).is_some() {
            return hit(db, key, kind);
        }
    }
    MatchResult::no_match()
}

/// Tiered lookup for model-name-keyed hardware (storage): the upper-cased
/// name as an exact key, then `*`-prefixed keys whose suffix is a substring
/// of the name, then plain keys that are a substring of the name. Database
/// insertion order breaks ties within a tier.
pub fn resolve_name(db: &SupportDatabase, model: &str) -> MatchResult {
    let name = model.trim().to_uppercase();
    if name.is_empty() {
        return MatchResult::no_match();
    }
    if db.status_of(&name).is_some() {
        return hit(db, &name, MatchKind::Exact);
    }
    for key in db.keys() {
        if let Some(suffix) = key.strip_prefix('*')
            && !suffix.is_empty()
            && db.status_of(key).is_some()
            && name.contains(suffix)
        {
            return hit(db, key, MatchKind::Fuzzy);
        }
    }
    for key in db.keys() {
        if !key.starts_with('*') && db.status_of(key).is_some() && name.contains(key) {
            return hit(db, key, MatchKind::Wildcard);
        }
    }
    MatchResult::no_match()
}

/// Display policy: a stored `"1"` is supported (flagged as vendor-level for
/// wildcard hits), any other present value is unsupported, absence is unknown.
pub fn status_label(res: &MatchResult) -> &'static str {
    match res.status.as_deref() {
        Some("1") if res.kind == MatchKind::Wildcard => "supported (vendor)",
        Some("1") => "supported",
        Some(_) => "unsupported",
        None => "unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::support_db::SupportDatabase;

    fn tiered_db() -> SupportDatabase {
        SupportDatabase::from_text(
            "1002&FFFF=1\n1002&FFFF.info=AMD vendor fallback\n1002&67FF=1\n1002&67FF.kext=WhateverGreen\n1002&67DF=1\n1002&67DF.info=RX 480/580\n",
        )
    }

    #[test]
    fn id_tier_precedence() {
        let db = tiered_db();
        let exact = resolve_id(&db, "1002&67DF");
        assert_eq!(exact.kind, MatchKind::Exact);
        assert_eq!(exact.matched_key.as_deref(), Some("1002&67DF"));
        assert_eq!(exact.detail, "RX 480/580");

        let fuzzy = resolve_id(&db, "1002&67AA");
        assert_eq!(fuzzy.kind, MatchKind::Fuzzy);
        assert_eq!(fuzzy.matched_key.as_deref(), Some("1002&67FF"));
        assert_eq!(fuzzy.driver, "WhateverGreen");

        let wild = resolve_id(&db, "1002&9999");
        assert_eq!(wild.kind, MatchKind::Wildcard);
        assert_eq!(wild.matched_key.as_deref(), Some("1002&FFFF"));

        let none = resolve_id(&db, "5555&0000");
        assert_eq!(none.kind, MatchKind::None);
        assert!(none.status.is_none());
    }

    #[test]
    fn malformed_query_short_circuits() {
        let db = tiered_db();
        assert_eq!(resolve_id(&db, "").kind, MatchKind::None);
        assert_eq!(resolve_id(&db, "1002&67D").kind, MatchKind::None);
        assert_eq!(resolve_id(&db, "not an id").kind, MatchKind::None);
    }

    #[test]
    fn absent_status_does_not_win_a_tier() {
        // 1002&67DF exists only via .info, so the fuzzy tier must win.
        let db = SupportDatabase::from_text("1002&67DF.info=seen once\n1002&67FF=1\n");
        let res = resolve_id(&db, "1002&67DF");
        assert_eq!(res.kind, MatchKind::Fuzzy);
        assert_eq!(res.matched_key.as_deref(), Some("1002&67FF"));
    }

    #[test]
    fn raw_status_is_preserved() {
        let db = SupportDatabase::from_text("1002&67DF=2\n");
        let res = resolve_id(&db, "1002&67DF");
        assert_eq!(res.status.as_deref(), Some("2"));
        assert_eq!(status_label(&res), "unsupported");
    }

    #[test]
    fn name_tier_precedence() {
        let db = SupportDatabase::from_text(
            "SAMSUNG SSD 970 EVO 1TB=1\n*970 EVO=1\n*970 EVO.info=NVMe family\nSAMSUNG=0\n",
        );
        let exact = resolve_name(&db, "Samsung SSD 970 EVO 1TB");
        assert_eq!(exact.kind, MatchKind::Exact);

        let fuzzy = resolve_name(&db, "Samsung SSD 970 EVO 2TB");
        assert_eq!(fuzzy.kind, MatchKind::Fuzzy);
        assert_eq!(fuzzy.matched_key.as_deref(), Some("*970 EVO"));
        assert_eq!(fuzzy.detail, "NVMe family");

        let wild = resolve_name(&db, "Samsung SSD 860 QVO");
        assert_eq!(wild.kind, MatchKind::Wildcard);
        assert_eq!(wild.matched_key.as_deref(), Some("SAMSUNG"));
        assert_eq!(status_label(&wild), "unsupported");

        assert_eq!(resolve_name(&db, "WDC WD10EZEX").kind, MatchKind::None);
        assert_eq!(resolve_name(&db, "  ").kind, MatchKind::None);
    }

    #[test]
    fn name_wildcard_ties_break_on_insertion_order() {
        let db = SupportDatabase::from_text("EVO=1\nSAMSUNG=0\n");
        let res = resolve_name(&db, "Samsung SSD 970 EVO");
        assert_eq!(res.matched_key.as_deref(), Some("EVO"));
    }

    #[test]
    fn wildcard_hit_gets_vendor_label() {
        let db = tiered_db();
        let wild = resolve_id(&db, "1002&9999");
        assert_eq!(status_label(&wild), "supported (vendor)");
        let exact = resolve_id(&db, "1002&67DF");
        assert_eq!(status_label(&exact), "supported");
    }
}
