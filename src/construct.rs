//! Building keys and values from argument bundles.
//!
//! `emplace_*` operations take their arguments as a tuple and turn the
//! leading part (everything before the visitor) into a `(K, V)` pair through
//! [`IntoEntry`]. Besides ready-made pairs, a pair can be built piecewise:
//! `(Piecewise, key_args, value_args)` constructs the key from `key_args`
//! and the value from `value_args`, each through [`Construct`].

/// Marker selecting piecewise construction in an argument bundle.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct Piecewise;

/// Build `Self` from an argument tuple.
///
/// Provided for `()` (via `Default`) and for `(T,)` (the value itself).
/// Implement it for your own types to accept other argument shapes:
///
/// ```
/// use partitioned_hashmap::Construct;
///
/// struct Span { start: u32, len: u32 }
///
/// impl Construct<(u32, u32)> for Span {
///     fn construct((start, end): (u32, u32)) -> Self {
///         Span { start, len: end - start }
///     }
/// }
///
/// let s = Span::construct((4, 10));
/// assert_eq!((s.start, s.len), (4, 6));
/// ```
pub trait Construct<Args>: Sized {
    fn construct(args: Args) -> Self;
}

impl<T: Default> Construct<()> for T {
    #[inline]
    fn construct((): ()) -> T {
        T::default()
    }
}

impl<T> Construct<(T,)> for T {
    #[inline]
    fn construct((value,): (T,)) -> T {
        value
    }
}

/// The argument part of an `emplace_*` bundle: anything that yields a key
/// and a value.
pub trait IntoEntry<K, V> {
    fn into_entry(self) -> (K, V);
}

impl<K, V> IntoEntry<K, V> for (K, V) {
    #[inline]
    fn into_entry(self) -> (K, V) {
        self
    }
}

/// A lone key gets a default value.
impl<K, V: Default> IntoEntry<K, V> for (K,) {
    #[inline]
    fn into_entry(self) -> (K, V) {
        (self.0, V::default())
    }
}

impl<K, V, KA, VA> IntoEntry<K, V> for (Piecewise, KA, VA)
where
    K: Construct<KA>,
    V: Construct<VA>,
{
    #[inline]
    fn into_entry(self) -> (K, V) {
        let (Piecewise, key_args, value_args) = self;
        (K::construct(key_args), V::construct(value_args))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Point {
        x: i32,
        y: i32,
    }

    impl Construct<(i32, i32)> for Point {
        fn construct((x, y): (i32, i32)) -> Self {
            Point { x, y }
        }
    }

    #[test]
    fn pair_passes_through() {
        let (k, v): (String, u8) = ("k".to_string(), 3).into_entry();
        assert_eq!((k.as_str(), v), ("k", 3));
    }

    #[test]
    fn lone_key_defaults_value() {
        let (k, v): (u32, Vec<u8>) = (5u32,).into_entry();
        assert_eq!(k, 5);
        assert!(v.is_empty());
    }

    #[test]
    fn piecewise_builds_both_sides() {
        let (k, v): (String, Point) = (Piecewise, ("origin".to_string(),), (0, 1)).into_entry();
        assert_eq!(k, "origin");
        assert_eq!(v, Point { x: 0, y: 1 });

        let (k, v): (u64, String) = (Piecewise, (9u64,), ()).into_entry();
        assert_eq!((k, v.as_str()), (9, ""));
    }
}
