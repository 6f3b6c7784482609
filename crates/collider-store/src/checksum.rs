//! Result fingerprints for corruption detection.
//!
//! The checksum is a 32-bit rolling hash (`h = h * 31 + unit` over UTF-16 code
//! units) of a canonical JSON rendering of the result's semantic fields,
//! encoded in base 36. It detects accidental corruption and out-of-band
//! mutation. It is NOT a security mechanism: anyone able to modify a result can
//! trivially recompute a matching checksum.
//!
//! Covered fields: `subtaskId`, `agentId`, `status`, `executionTime`,
//! `retryCount` and `result.content`. Bookkeeping fields (`storageTimestamp`,
//! `executionOrder`) and graph relations are excluded.

use collider_model::SubtaskResult;
use serde_json::json;

const BASE36_DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Compute the fingerprint of a result's semantic fields.
pub fn compute_checksum(result: &SubtaskResult) -> String {
  // serde_json's default map keeps keys sorted, so the rendering is canonical.
  let canonical = json!({
    "subtaskId": result.subtask_id,
    "agentId": result.agent_id,
    "status": result.status,
    "executionTime": result.execution_time,
    "retryCount": result.retry_count,
    "content": result.result.content,
  })
  .to_string();

  to_base36(rolling_hash(&canonical))
}

/// Whether the stored checksum matches the result's current content.
pub fn verify_checksum(result: &SubtaskResult) -> bool {
  compute_checksum(result) == result.checksum
}

fn rolling_hash(input: &str) -> u32 {
  input.encode_utf16().fold(0u32, |hash, unit| {
    (hash << 5).wrapping_sub(hash).wrapping_add(u32::from(unit))
  })
}

fn to_base36(mut value: u32) -> String {
  if value == 0 {
    return "0".to_string();
  }

  let mut digits = Vec::with_capacity(7);
  while value > 0 {
    digits.push(BASE36_DIGITS[(value % 36) as usize]);
    value /= 36;
  }
  digits.reverse();
  digits.into_iter().map(char::from).collect()
}
