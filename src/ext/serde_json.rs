// === Module Header (agents-tooling) START ===
// header: Parsed by scripts/check_module_headers.sh for purpose/role presence; keep keys on single-line entries.
// purpose: Dotted-path lookups into API payloads (wiki envelopes, commit listings) as borrowed strings
// role: extension/serde_json
// outputs: JsonFetch trait and JsonFetched wrapper
// invariants: No panics; missing paths or out-of-range indices yield None; numeric segments index arrays
// tie_breakers: contracts > orchestration > correctness > performance > minimal_diffs
// === Module Header END ===

use serde_json::Value;

/// A location inside a JSON document, possibly absent.
pub struct JsonFetched<'a> {
  inner: Option<&'a Value>,
}

impl<'a> JsonFetched<'a> {
  /// Borrow the located value when it is a JSON string.
  pub fn as_str(&self) -> Option<&'a str> {
    self.inner.and_then(Value::as_str)
  }
}

/// Fetch nested values via dotted paths like `body.view.value` or `0.commit.committer.date`.
pub trait JsonFetch {
  fn fetch(&self, path: &str) -> JsonFetched<'_>;
}

impl JsonFetch for Value {
  fn fetch(&self, path: &str) -> JsonFetched<'_> {
    if path.is_empty() {
      return JsonFetched { inner: Some(self) };
    }

    let mut cur = self;

    for key in path.split('.') {
      let next = match cur {
        Value::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => cur.get(key),
      };

      match next {
        Some(v) => cur = v,
        None => return JsonFetched { inner: None },
      }
    }

    JsonFetched { inner: Some(cur) }
  }
}
