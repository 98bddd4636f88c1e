// handlers/public/flags.rs - POST /flags/eval handler

use axum::extract::State;
use axum::response::Json;
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};

use crate::error::ApiError;
use crate::store::FeatureFlag;
use crate::AppState;

/// POST /flags/eval - evaluate every flag for one caller
///
/// Body is optional; `{"user_id": "..."}` opts the caller into
/// percentage rollouts. Anonymous callers only see globally enabled
/// flags.
pub async fn eval(
    State(state): State<AppState>,
    body: Option<Json<Value>>,
) -> Result<Json<Value>, ApiError> {
    let user_id = body
        .as_ref()
        .and_then(|payload| payload.0.get("user_id"))
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());

    let flags = state.store.list_flags().await?;
    let evaluated = eval_flags(&flags, user_id.as_deref());
    Ok(Json(json!({"flags": evaluated})))
}

/// A flag that is on evaluates to its payload when one is set, `true`
/// otherwise; a flag that is off evaluates to `false`.
pub fn eval_flags(flags: &[FeatureFlag], user_id: Option<&str>) -> Map<String, Value> {
    let mut out = Map::new();
    for flag in flags {
        let on = if flag.enabled {
            true
        } else if flag.rollout_percentage > 0 {
            match user_id {
                Some(id) => rollout_bucket(&flag.flag_key, id) < flag.rollout_percentage as u64,
                None => false,
            }
        } else {
            false
        };

        let value = if on {
            flag.payload.clone().unwrap_or(Value::Bool(true))
        } else {
            Value::Bool(false)
        };
        out.insert(flag.flag_key.clone(), value);
    }
    out
}

/// Deterministic bucket in 0..100 from the first eight bytes of
/// SHA-256("key:id") read big-endian. The same user keeps the same
/// bucket for a flag across calls and across processes, so raising the
/// percentage only ever adds users, never reshuffles them.
fn rollout_bucket(flag_key: &str, user_id: &str) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(flag_key.as_bytes());
    hasher.update(b":");
    hasher.update(user_id.as_bytes());
    let digest = hasher.finalize();

    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(prefix) % 100
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn flag(key: &str, enabled: bool, pct: i32, payload: Option<Value>) -> FeatureFlag {
        FeatureFlag {
            flag_key: key.to_string(),
            enabled,
            rollout_percentage: pct,
            payload,
        }
    }

    #[test]
    fn buckets_are_deterministic_and_bounded() {
        for user in ["user-1", "user-2", "another"] {
            let bucket = rollout_bucket("dark_mode", user);
            assert!(bucket < 100);
            assert_eq!(bucket, rollout_bucket("dark_mode", user));
        }
        // Different flags bucket the same user independently
        assert!(
            (0..50).any(|i| {
                let user = format!("user-{}", i);
                rollout_bucket("flag_a", &user) != rollout_bucket("flag_b", &user)
            })
        );
    }

    #[test]
    fn enabled_flag_is_on_for_everyone() {
        let flags = [flag("banner", true, 0, None)];
        assert_eq!(eval_flags(&flags, None)["banner"], json!(true));
        assert_eq!(eval_flags(&flags, Some("u1"))["banner"], json!(true));
    }

    #[test]
    fn payload_replaces_the_bare_true() {
        let flags = [flag("promo", true, 0, Some(json!({"theme": "summer"})))];
        assert_eq!(eval_flags(&flags, None)["promo"], json!({"theme": "summer"}));
    }

    #[test]
    fn rollout_skips_anonymous_callers() {
        let flags = [flag("search_v2", false, 100, None)];
        assert_eq!(eval_flags(&flags, None)["search_v2"], json!(false));
        assert_eq!(eval_flags(&flags, Some("u1"))["search_v2"], json!(true));
    }

    #[test]
    fn zero_percent_admits_nobody() {
        let flags = [flag("off", false, 0, None)];
        for i in 0..50 {
            let user = format!("user-{}", i);
            assert_eq!(eval_flags(&flags, Some(&user))["off"], json!(false));
        }
    }

    #[test]
    fn raising_the_percentage_never_evicts_a_user() {
        for i in 0..200 {
            let user = format!("user-{}", i);
            let at_30 = eval_flags(&[flag("grow", false, 30, None)], Some(&user));
            let at_70 = eval_flags(&[flag("grow", false, 70, None)], Some(&user));
            if at_30["grow"] == json!(true) {
                assert_eq!(at_70["grow"], json!(true), "user {} fell out of rollout", user);
            }
        }
    }

    #[test]
    fn rollout_share_tracks_the_percentage() {
        let flags = [flag("ratio", false, 30, None)];
        let mut on = 0;
        for i in 0..2000 {
            let user = format!("user-{}", i);
            if eval_flags(&flags, Some(&user))["ratio"] == json!(true) {
                on += 1;
            }
        }
        // 30% of 2000 is 600; allow a wide band since the hash decides
        assert!((480..=720).contains(&on), "on={}", on);
    }
}
