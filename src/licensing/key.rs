use chrono::NaiveDate;
use rand::Rng;

use crate::models::Plan;

pub const KEY_PREFIX: &str = "QW";

const PLUGIN_CODE_LEN: usize = 6;
const SUFFIX_LEN: usize = 6;
const SUFFIX_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Uppercased plugin slug with hyphens removed, capped at six characters.
pub fn plugin_code(plugin: &str) -> String {
    plugin
        .to_uppercase()
        .chars()
        .filter(|c| *c != '-')
        .take(PLUGIN_CODE_LEN)
        .collect()
}

/// Generate a license key: `QW-<PLUGIN>-<YEAR|LIFE>-<YYYYMMDD>-<XXXXXX>`.
///
/// The six-character suffix (36^6 space) is the only thing separating two keys
/// issued for the same plugin, plan and day. Uniqueness is enforced by the store.
pub fn generate_license_key(plugin: &str, plan: Plan, issued_at: NaiveDate) -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..SUFFIX_LEN)
        .map(|_| SUFFIX_CHARSET[rng.gen_range(0..SUFFIX_CHARSET.len())] as char)
        .collect();

    format!(
        "{}-{}-{}-{}-{}",
        KEY_PREFIX,
        plugin_code(plugin),
        plan.key_code(),
        issued_at.format("%Y%m%d"),
        suffix
    )
}
