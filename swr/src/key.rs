//! Canonical string keys for storage backends.
//!
//! Every identifier handed to a [`Cache`](crate::Cache) is turned into a
//! deterministic string before it reaches the driver. Top-level strings are used
//! verbatim so `"a"` is stored as `a`. Inside composite keys (tuples, options,
//! sequences) strings are quoted and escaped, which keeps `("a:b", "c")` and
//! `("a", "b:c")` apart.

use std::borrow::Cow;
use std::fmt::Write;
use std::rc::Rc;
use std::sync::Arc;

/// A value that can be used as a cache key.
///
/// Implementations must be deterministic: the same logical identifier always
/// produces the same string.
pub trait CacheKey {
  /// Writes this key as a component of a larger key.
  fn write_key(&self, out: &mut String);

  /// Returns the key in the form it has at the top level.
  ///
  /// Defaults to [`write_key`](CacheKey::write_key); strings override it to
  /// skip quoting.
  fn cache_key(&self) -> String {
    let mut out = String::new();
    self.write_key(&mut out);
    out
  }
}

/// Converts an identifier into its storage key.
#[inline]
pub fn canonicalize<K: CacheKey + ?Sized>(key: &K) -> String {
  key.cache_key()
}

fn write_quoted(s: &str, out: &mut String) {
  // `{:?}` escapes quotes, backslashes and control characters.
  let _ = write!(out, "{:?}", s);
}

impl CacheKey for str {
  fn write_key(&self, out: &mut String) {
    write_quoted(self, out);
  }

  fn cache_key(&self) -> String {
    self.to_owned()
  }
}

impl CacheKey for String {
  fn write_key(&self, out: &mut String) {
    self.as_str().write_key(out);
  }

  fn cache_key(&self) -> String {
    self.clone()
  }
}

impl CacheKey for Cow<'_, str> {
  fn write_key(&self, out: &mut String) {
    self.as_ref().write_key(out);
  }

  fn cache_key(&self) -> String {
    self.as_ref().to_owned()
  }
}

impl CacheKey for char {
  fn write_key(&self, out: &mut String) {
    let _ = write!(out, "{:?}", self);
  }

  fn cache_key(&self) -> String {
    self.to_string()
  }
}

macro_rules! impl_display_key {
  ($($t:ty),* $(,)?) => {
    $(
      impl CacheKey for $t {
        #[inline]
        fn write_key(&self, out: &mut String) {
          let _ = write!(out, "{}", self);
        }
      }
    )*
  };
}

impl_display_key!(bool, u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize);

impl<T: CacheKey + ?Sized> CacheKey for &T {
  fn write_key(&self, out: &mut String) {
    (**self).write_key(out);
  }

  fn cache_key(&self) -> String {
    (**self).cache_key()
  }
}

macro_rules! impl_pointer_key {
  ($($p:ident),*) => {
    $(
      impl<T: CacheKey + ?Sized> CacheKey for $p<T> {
        fn write_key(&self, out: &mut String) {
          (**self).write_key(out);
        }

        fn cache_key(&self) -> String {
          (**self).cache_key()
        }
      }
    )*
  };
}

impl_pointer_key!(Box, Arc, Rc);

impl<T: CacheKey> CacheKey for Option<T> {
  fn write_key(&self, out: &mut String) {
    match self {
      Some(inner) => {
        out.push_str("Some(");
        inner.write_key(out);
        out.push(')');
      }
      None => out.push_str("None"),
    }
  }
}

impl<T: CacheKey> CacheKey for [T] {
  fn write_key(&self, out: &mut String) {
    out.push('[');
    for (i, item) in self.iter().enumerate() {
      if i > 0 {
        out.push(',');
      }
      item.write_key(out);
    }
    out.push(']');
  }
}

impl<T: CacheKey> CacheKey for Vec<T> {
  fn write_key(&self, out: &mut String) {
    self.as_slice().write_key(out);
  }
}

impl<T: CacheKey, const N: usize> CacheKey for [T; N] {
  fn write_key(&self, out: &mut String) {
    self.as_slice().write_key(out);
  }
}

macro_rules! impl_tuple_key {
  ($($name:ident : $idx:tt),+) => {
    impl<$($name: CacheKey),+> CacheKey for ($($name,)+) {
      fn write_key(&self, out: &mut String) {
        out.push('(');
        let mut _first = true;
        $(
          if !_first {
            out.push(',');
          }
          _first = false;
          self.$idx.write_key(out);
        )+
        out.push(')');
      }
    }
  };
}

impl_tuple_key!(A: 0);
impl_tuple_key!(A: 0, B: 1);
impl_tuple_key!(A: 0, B: 1, C: 2);
impl_tuple_key!(A: 0, B: 1, C: 2, D: 3);
impl_tuple_key!(A: 0, B: 1, C: 2, D: 3, E: 4);
impl_tuple_key!(A: 0, B: 1, C: 2, D: 3, E: 4, F: 5);
